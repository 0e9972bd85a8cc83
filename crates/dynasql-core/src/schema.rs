//! Caller-supplied table descriptors.
//!
//! The compiler never calls `DescribeTable`; the key schema and indexes of
//! every table a statement may touch are registered up front in a [`Catalog`].

use std::collections::HashMap;

use dynasql_model::types::ScalarAttributeType;

/// A key attribute: its name and scalar type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAttribute {
    pub name: String,
    pub attr_type: ScalarAttributeType,
}

impl KeyAttribute {
    #[must_use]
    pub fn new(name: impl Into<String>, attr_type: ScalarAttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
        }
    }
}

/// Hash key plus optional range key, for a table or an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    pub hash_key: KeyAttribute,
    pub range_key: Option<KeyAttribute>,
}

impl KeySchema {
    /// Returns `true` if `attribute` is the hash or range key.
    #[must_use]
    pub fn is_key(&self, attribute: &str) -> bool {
        self.hash_key.name == attribute
            || self.range_key.as_ref().is_some_and(|r| r.name == attribute)
    }
}

/// Whether an index shares the table's partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Local,
    Global,
}

/// Attributes copied into an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexProjection {
    All,
    KeysOnly,
    /// Keys plus the listed non-key attributes.
    Include(Vec<String>),
}

/// A local or global secondary index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryIndex {
    pub name: String,
    pub kind: IndexKind,
    pub keys: KeySchema,
    pub projection: IndexProjection,
}

/// Key schema and indexes of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub keys: KeySchema,
    pub indexes: Vec<SecondaryIndex>,
}

impl TableSchema {
    /// A table with only a hash key.
    #[must_use]
    pub fn new(name: impl Into<String>, hash_key: KeyAttribute) -> Self {
        Self {
            name: name.into(),
            keys: KeySchema {
                hash_key,
                range_key: None,
            },
            indexes: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_range_key(mut self, range_key: KeyAttribute) -> Self {
        self.keys.range_key = Some(range_key);
        self
    }

    /// Add a local secondary index; it shares the table's hash key.
    #[must_use]
    pub fn with_local_index(
        mut self,
        name: impl Into<String>,
        range_key: KeyAttribute,
        projection: IndexProjection,
    ) -> Self {
        self.indexes.push(SecondaryIndex {
            name: name.into(),
            kind: IndexKind::Local,
            keys: KeySchema {
                hash_key: self.keys.hash_key.clone(),
                range_key: Some(range_key),
            },
            projection,
        });
        self
    }

    #[must_use]
    pub fn with_global_index(
        mut self,
        name: impl Into<String>,
        keys: KeySchema,
        projection: IndexProjection,
    ) -> Self {
        self.indexes.push(SecondaryIndex {
            name: name.into(),
            kind: IndexKind::Global,
            keys,
            projection,
        });
        self
    }

    #[must_use]
    pub fn index(&self, name: &str) -> Option<&SecondaryIndex> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Type of `attribute` if it is a key of the table or of any index.
    #[must_use]
    pub fn key_type(&self, attribute: &str) -> Option<ScalarAttributeType> {
        std::iter::once(&self.keys)
            .chain(self.indexes.iter().map(|i| &i.keys))
            .flat_map(|k| std::iter::once(&k.hash_key).chain(k.range_key.as_ref()))
            .find(|k| k.name == attribute)
            .map(|k| k.attr_type)
    }

    /// Attribute names stored in `index` when only its projection is read.
    ///
    /// `None` means every attribute is projected.
    #[must_use]
    pub fn projected_attributes(&self, index: &SecondaryIndex) -> Option<Vec<String>> {
        let mut names = vec![self.keys.hash_key.name.clone()];
        names.extend(self.keys.range_key.iter().map(|k| k.name.clone()));
        names.push(index.keys.hash_key.name.clone());
        names.extend(index.keys.range_key.iter().map(|k| k.name.clone()));
        match &index.projection {
            IndexProjection::All => return None,
            IndexProjection::KeysOnly => {}
            IndexProjection::Include(extra) => names.extend(extra.iter().cloned()),
        }
        let mut unique = Vec::with_capacity(names.len());
        for name in names {
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Some(unique)
    }
}

/// Schemas of all tables a [`DynamoSql`](crate::context::DynamoSql) can address.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    tables: HashMap<String, TableSchema>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table, replacing any previous schema with the same name.
    #[must_use]
    pub fn with_table(mut self, schema: TableSchema) -> Self {
        self.register(schema);
        self
    }

    pub fn register(&mut self, schema: TableSchema) {
        self.tables.insert(schema.name.clone(), schema);
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::game_scores_schema;

    #[test]
    fn test_should_find_key_types_across_indexes() {
        let schema = game_scores_schema();
        assert_eq!(schema.key_type("UserId"), Some(ScalarAttributeType::S));
        assert_eq!(schema.key_type("TopScore"), Some(ScalarAttributeType::N));
        assert_eq!(schema.key_type("Wins"), None);
    }

    #[test]
    fn test_should_list_keys_only_projection() {
        let schema = game_scores_schema();
        let lsi = schema.index("TopScoreIndex").unwrap();
        assert_eq!(
            schema.projected_attributes(lsi),
            Some(vec![
                "UserId".to_owned(),
                "GameTitle".to_owned(),
                "TopScore".to_owned()
            ])
        );
    }

    #[test]
    fn test_should_include_extra_projected_attributes() {
        let schema = TableSchema::new("T", KeyAttribute::new("pk", ScalarAttributeType::S))
            .with_global_index(
                "ByStatus",
                KeySchema {
                    hash_key: KeyAttribute::new("status", ScalarAttributeType::S),
                    range_key: None,
                },
                IndexProjection::Include(vec!["owner".to_owned()]),
            );
        let gsi = schema.index("ByStatus").unwrap();
        assert_eq!(
            schema.projected_attributes(gsi),
            Some(vec!["pk".to_owned(), "status".to_owned(), "owner".to_owned()])
        );
    }

    #[test]
    fn test_should_look_up_registered_tables() {
        let catalog = Catalog::new().with_table(game_scores_schema());
        assert!(catalog.table("GameScores").is_some());
        assert!(catalog.table("Missing").is_none());
        assert_eq!(catalog.tables().count(), 1);
    }
}
