//! Relationship includer: resolves `?include=` paths into a compound document.

use std::collections::{BTreeSet, HashSet};

use crate::database::{EntityStore, Record, RecordKey, StoreError};

/// Include paths deeper than this are truncated
pub const MAX_INCLUDE_DEPTH: usize = 2;

/// Related records accumulated for `included`, unique by (type, id), in
/// first-seen order.
#[derive(Debug, Default)]
pub struct CompoundDocument {
    seen: HashSet<RecordKey>,
    records: Vec<Record>,
}

impl CompoundDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the record was already present
    pub fn push(&mut self, record: Record) -> bool {
        if let Some(key) = record.key() {
            if !self.seen.insert(key) {
                return false;
            }
        }
        self.records.push(record);
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}

/// Eager-load every exposed relation on `record` so its linkage can be
/// serialized. Already loaded relations are kept.
pub async fn load_relations(store: &dyn EntityStore, record: &mut Record) -> Result<(), StoreError> {
    let exposed = record.exposed_relations().to_vec();
    for relation in exposed {
        if record.relation(&relation).is_some() {
            continue;
        }
        let related = store.related(record, &relation).await?;
        record.set_relation(relation, related);
    }
    Ok(())
}

/// Resolve include paths against primary records.
///
/// Unexposed relation names are skipped. Every record reached is returned
/// with its own exposed relations loaded.
pub async fn resolve(store: &dyn EntityStore, primary: &[Record], paths: &[String]) -> Result<Vec<Record>, StoreError> {
    let mut document = CompoundDocument::new();
    let mut skipped = BTreeSet::new();

    let paths: Vec<Vec<&str>> = paths
        .iter()
        .map(|path| {
            let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
            if segments.len() > MAX_INCLUDE_DEPTH {
                tracing::warn!("Include path '{}' is deeper than {} segments; truncating", path, MAX_INCLUDE_DEPTH);
            }
            segments.into_iter().take(MAX_INCLUDE_DEPTH).collect::<Vec<&str>>()
        })
        .filter(|segments| !segments.is_empty())
        .collect();

    for record in primary {
        for segments in &paths {
            let first = segments[0];
            if !record.exposes(first) {
                skipped.insert(format!("{}.{}", record.type_name(), first));
                continue;
            }
            let related = match record.relation(first) {
                Some(related) => related.clone(),
                None => store.related(record, first).await?,
            };

            for mut child in related.into_records() {
                load_relations(store, &mut child).await?;

                let second = segments.get(1).copied();
                let nested = match second {
                    Some(second) if child.exposes(second) => child.relation(second).cloned(),
                    Some(second) => {
                        skipped.insert(format!("{}.{}", child.type_name(), second));
                        None
                    }
                    None => None,
                };
                document.push(child);

                for mut grandchild in nested.map(|n| n.into_records()).unwrap_or_default() {
                    load_relations(store, &mut grandchild).await?;
                    document.push(grandchild);
                }
            }
        }
    }

    for relation in skipped {
        tracing::warn!("Ignoring include of unexposed relation {}", relation);
    }
    tracing::debug!("Resolved {} included records for {} primary records", document.len(), primary.len());
    Ok(document.into_records())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, Schema, TypeSchema};
    use serde_json::json;

    async fn blog() -> MemoryStore {
        let schema = Schema::new()
            .with_type(
                TypeSchema::new("posts")
                    .belongs_to("author", "users")
                    .has_many("comments", "comments", "post_id")
                    .expose(&["author", "comments"]),
            )
            .with_type(TypeSchema::new("comments").belongs_to("author", "users").expose(&["author"]))
            .with_type(TypeSchema::new("users"));
        let store = MemoryStore::new(schema);
        store.seed("users", json!({"name": "ann"})).await.unwrap();
        store.seed("users", json!({"name": "bob"})).await.unwrap();
        store.seed("posts", json!({"title": "a", "author_id": 1})).await.unwrap();
        store.seed("comments", json!({"body": "x", "post_id": 1, "author_id": 1})).await.unwrap();
        store.seed("comments", json!({"body": "y", "post_id": 1, "author_id": 2})).await.unwrap();
        store
    }

    fn keys(records: &[Record]) -> Vec<(String, String)> {
        records.iter().map(|r| (r.type_name().to_string(), r.id_string().unwrap())).collect()
    }

    #[tokio::test]
    async fn same_record_through_two_paths_is_included_once() {
        let store = blog().await;
        let post = store.find("posts", "1").await.unwrap().unwrap();
        let paths = vec!["author".to_string(), "comments.author".to_string()];

        let included = resolve(&store, &[post], &paths).await.unwrap();
        assert_eq!(
            keys(&included),
            vec![
                ("users".into(), "1".into()),
                ("comments".into(), "1".into()),
                ("comments".into(), "2".into()),
                ("users".into(), "2".into()),
            ]
        );
        // included records carry their own linkage
        assert!(included[1].relation("author").is_some());
    }

    #[tokio::test]
    async fn unexposed_and_unknown_paths_are_skipped() {
        let store = blog().await;
        let comment = store.find("comments", "1").await.unwrap().unwrap();
        let paths = vec!["post".to_string(), "author.posts".to_string()];

        let included = resolve(&store, &[comment], &paths).await.unwrap();
        assert_eq!(keys(&included), vec![("users".into(), "1".into())]);
    }

    #[tokio::test]
    async fn load_relations_fills_exposed_only() {
        let store = blog().await;
        let mut post = store.find("posts", "1").await.unwrap().unwrap();
        load_relations(&store, &mut post).await.unwrap();
        assert_eq!(post.relations().len(), 2);
        assert_eq!(post.relation("comments").unwrap().records().len(), 2);
    }

    #[test]
    fn compound_document_dedups_by_key() {
        let user = TypeSchema::new("users").record_from_row(json!({"id": 1}).as_object().unwrap().clone());
        let mut document = CompoundDocument::new();
        assert!(document.is_empty());
        assert!(document.push(user.clone()));
        assert!(!document.push(user));
        assert_eq!(document.len(), 1);
    }
}
