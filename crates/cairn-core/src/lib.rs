pub mod config;
pub mod error;
pub mod schema;

pub use config::CairnConfig;
pub use error::{CairnError, Result};
pub use schema::{
    CollectionAttribute, CollectionKind, CollectionPatch, CollectionSchema, FieldDescriptor,
    FieldKind, FieldList, PatchOp,
};
