mod collection;
mod field;
mod patch;

pub use collection::{CollectionAttribute, CollectionKind, CollectionSchema};
pub use field::{FieldDescriptor, FieldKind, FieldList};
pub use patch::{CollectionPatch, PatchOp};
