//! Migrations compiled into the binary.

use cairn_core::error::Result;
use cairn_runtime::migrations::Migration;

const BUNDLED: &[(&str, &str)] = &[
    (
        "1747952550_updated_timeline",
        include_str!("../bundled/1747952550_updated_timeline.json"),
    ),
    (
        "1749837751_updated_trail_like",
        include_str!("../bundled/1749837751_updated_trail_like.json"),
    ),
];

/// The trail app's own schema migrations.
pub fn bundled_migrations() -> Result<Vec<Migration>> {
    BUNDLED
        .iter()
        .map(|(id, body)| Migration::from_json(*id, body))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cairn_core::schema::{
        CollectionAttribute, CollectionKind, CollectionSchema, FieldDescriptor, FieldKind,
        FieldList, PatchOp,
    };
    use cairn_runtime::migrations::{
        CheckOutcome, MigrationFile, MigrationId, MigrationRegistry, MigrationRunner,
        SchemaSession,
    };
    use cairn_runtime::store::MemoryStore;

    fn bundled(id: &str) -> Migration {
        bundled_migrations()
            .unwrap()
            .into_iter()
            .find(|m| m.id().as_str() == id)
            .unwrap()
    }

    /// First `set` value in a bundled file's `down` patches.
    fn previous_value(index: usize) -> String {
        let file: MigrationFile = serde_json::from_str(BUNDLED[index].1).unwrap();
        match &file.down.0[0].ops[0] {
            PatchOp::SetAttribute {
                value: Some(value), ..
            } => value.clone(),
            other => panic!("unexpected op: {other}"),
        }
    }

    fn json_field(id: &str, name: &str) -> FieldDescriptor {
        FieldDescriptor::new(id, name, FieldKind::Json).with_option("maxSize", 1)
    }

    fn timeline() -> CollectionSchema {
        let mut collection =
            CollectionSchema::new("pbc_468398817", "timeline", CollectionKind::View);
        collection.fields = FieldList::new(vec![
            FieldDescriptor::new("text3208210256", "id", FieldKind::Text)
                .system()
                .required(),
            json_field("json1510011622", "trail_id"),
            json_field("json2434853685", "iri"),
            json_field("json2862495610", "date"),
            json_field("json1579384326", "name"),
        ]);
        collection.list_rule = Some(String::new());
        collection.view_query = Some(previous_value(0));
        collection
    }

    fn trail_like() -> CollectionSchema {
        let mut collection =
            CollectionSchema::new("pbc_1995454416", "trail_like", CollectionKind::Base);
        collection.fields = FieldList::new(vec![
            FieldDescriptor::new("text3208210256", "id", FieldKind::Text)
                .system()
                .required(),
            FieldDescriptor::new("relation1017343113", "trail", FieldKind::Relation)
                .with_option("collectionId", "e864strfxo14pm4")
                .with_option("maxSelect", 1),
            FieldDescriptor::new("relation1280522653", "actor", FieldKind::Relation)
                .with_option("collectionId", "pbc_1010476043")
                .with_option("maxSelect", 1),
        ]);
        collection.view_rule = Some(previous_value(1));
        collection
    }

    #[test]
    fn test_bundled_migrations_parse() {
        let migrations = bundled_migrations().unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(
            migrations[0].describe_up(),
            vec![
                "pbc_468398817: set viewQuery",
                "pbc_468398817: remove field json2434853685",
                "pbc_468398817: insert json field 'trail_author_username' (json3184124860) at 2",
                "pbc_468398817: insert json field 'trail_author_domain' (json2887874732) at 3",
                "pbc_468398817: insert json field 'trail_iri' (json113557190) at 4",
            ]
        );
    }

    #[test]
    fn test_updated_timeline_round_trip() {
        let migration = bundled("1747952550_updated_timeline");
        let mut session = SchemaSession::new(vec![timeline()]);

        migration.apply(&mut session).unwrap();
        let collection = session.collection("timeline").unwrap();
        assert_eq!(
            collection.fields.names(),
            vec![
                "id",
                "trail_id",
                "trail_author_username",
                "trail_author_domain",
                "trail_iri",
                "date",
                "name",
            ]
        );
        let query = collection.view_query.as_deref().unwrap();
        assert!(query.contains("tapa.username as trail_author_username"));
        assert!(query.contains("trails.iri as trail_iri"));

        migration.revert(&mut session).unwrap();
        assert_eq!(session.collections(), &[timeline()]);
    }

    #[test]
    fn test_updated_trail_like_round_trip() {
        let migration = bundled("1749837751_updated_trail_like");
        let mut session = SchemaSession::new(vec![trail_like()]);

        migration.apply(&mut session).unwrap();
        assert_eq!(
            session
                .collection("pbc_1995454416")
                .unwrap()
                .attribute(CollectionAttribute::ViewRule),
            Some("actor.user = @request.auth.id")
        );

        migration.revert(&mut session).unwrap();
        assert_eq!(session.collections(), &[trail_like()]);
    }

    #[tokio::test]
    async fn test_bundled_migrations_run_and_revert() {
        let store = MemoryStore::with_collections(vec![timeline(), trail_like()]);
        let registry = MigrationRegistry::new(bundled_migrations().unwrap()).unwrap();
        let mut runner = MigrationRunner::new(store, registry);

        let report = runner.check().await.unwrap();
        assert!(report
            .entries
            .iter()
            .all(|e| e.outcome == CheckOutcome::RoundTrip));

        let report = runner.run_pending().await.unwrap();
        assert_eq!(
            report.applied,
            vec![
                MigrationId::from("1747952550_updated_timeline"),
                MigrationId::from("1749837751_updated_trail_like"),
            ]
        );

        runner.revert_last(2).await.unwrap();
        assert_eq!(runner.store().collections(), &[timeline(), trail_like()]);
    }

    #[tokio::test]
    async fn test_bundled_migrations_need_their_collections() {
        let registry = MigrationRegistry::new(bundled_migrations().unwrap()).unwrap();
        let mut runner = MigrationRunner::new(MemoryStore::new(), registry);

        let err = runner.run_pending().await.unwrap_err();
        assert_eq!(err.failed_identifier(), Some("1747952550_updated_timeline"));
    }
}
