use snafu::Snafu;

use crate::{DatabaseName, FamilyName, TableName};

/// A group of databases whose partitioned tables share a chunking scheme and
/// are colocated across workers.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DatabaseFamily {
    pub name: FamilyName,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

impl DatabaseFamily {
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.name.as_str().is_empty() {
            return EmptyFamilyNameSnafu.fail();
        }
        if self.min_replicas == 0 || self.min_replicas > self.max_replicas {
            return InvalidReplicaRangeSnafu {
                min: self.min_replicas,
                max: self.max_replicas,
            }
            .fail();
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Column {
    pub name: String,
}

/// One table within a [`Database`]: either *partitioned* (chunked) or
/// *regular* (fully replicated).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Table {
    pub name: TableName,
    pub columns: Vec<Column>,
    pub partitioning: Option<Partitioning>,
}

/// Chunking metadata for a partitioned table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Partitioning {
    pub is_director: bool,
    /// Foreign key column onto the director's object id. Empty for the
    /// director table itself.
    pub director_key: String,
    pub lat_column: String,
    pub lon_column: String,
}

impl Table {
    pub fn is_partitioned(&self) -> bool {
        self.partitioning.is_some()
    }

    fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }
}

/// A database within a [`DatabaseFamily`]: a collection of tables, at most
/// one of which is the partitioned family's director table.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Database {
    pub name: DatabaseName,
    pub family: FamilyName,
    pub tables: Vec<Table>,
}

impl Database {
    /// Validates the structural invariants:
    /// - the family reference is non-empty (resolvability against the live
    ///   set of families is the caller's job, since that requires the
    ///   `Configuration`'s family table);
    /// - at most one director table;
    /// - a director table's director key is empty;
    /// - a dependent partitioned table's director key names a column that
    ///   exists in its own schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.family.as_str().is_empty() {
            return UnresolvableFamilySnafu {
                database: self.name.clone(),
            }
            .fail();
        }

        let mut director: Option<&Table> = None;
        for table in &self.tables {
            let Some(partitioning) = &table.partitioning else {
                continue;
            };
            if partitioning.is_director {
                if let Some(existing) = director {
                    return MultipleDirectorTablesSnafu {
                        database: self.name.clone(),
                        first: existing.name.clone(),
                        second: table.name.clone(),
                    }
                    .fail();
                }
                if !partitioning.director_key.is_empty() {
                    return DirectorKeyNotEmptySnafu {
                        database: self.name.clone(),
                        table: table.name.clone(),
                    }
                    .fail();
                }
                director = Some(table);
            } else if !partitioning.director_key.is_empty() && !table.has_column(&partitioning.director_key)
            {
                return DirectorKeyMissingColumnSnafu {
                    database: self.name.clone(),
                    table: table.name.clone(),
                    column: partitioning.director_key.clone(),
                }
                .fail();
            }
        }
        Ok(())
    }

    pub fn director_table(&self) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| t.partitioning.as_ref().is_some_and(|p| p.is_director))
    }
}

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SchemaError {
    #[snafu(display("database family name must not be empty"))]
    EmptyFamilyName,

    #[snafu(display("family replica range is invalid: min={min}, max={max}"))]
    InvalidReplicaRange { min: u32, max: u32 },

    #[snafu(display("database '{database}' does not resolve to a known family"))]
    UnresolvableFamily { database: DatabaseName },

    #[snafu(display(
        "database '{database}' declares two director tables: '{first}' and '{second}'"
    ))]
    MultipleDirectorTables {
        database: DatabaseName,
        first: TableName,
        second: TableName,
    },

    #[snafu(display("director table '{database}'.'{table}' must have an empty director key"))]
    DirectorKeyNotEmpty { database: DatabaseName, table: TableName },

    #[snafu(display(
        "dependent table '{database}'.'{table}' declares director key '{column}' which is not one of its columns"
    ))]
    DirectorKeyMissingColumn {
        database: DatabaseName,
        table: TableName,
        column: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn director_table(name: &str) -> Table {
        Table {
            name: TableName::from(name),
            columns: vec![Column { name: "objectId".into() }],
            partitioning: Some(Partitioning {
                is_director: true,
                director_key: String::new(),
                lat_column: "decl".into(),
                lon_column: "ra".into(),
            }),
        }
    }

    fn dependent_table(name: &str, key: &str, columns: &[&str]) -> Table {
        Table {
            name: TableName::from(name),
            columns: columns.iter().map(|c| Column { name: c.to_string() }).collect(),
            partitioning: Some(Partitioning {
                is_director: false,
                director_key: key.into(),
                lat_column: "decl".into(),
                lon_column: "ra".into(),
            }),
        }
    }

    #[test]
    fn valid_database_passes() {
        let db = Database {
            name: "D".into(),
            family: "F".into(),
            tables: vec![
                director_table("Object"),
                dependent_table("Source", "objectId", &["objectId", "flux"]),
            ],
        };
        assert!(db.validate().is_ok());
        assert_eq!(db.director_table().unwrap().name, TableName::from("Object"));
    }

    #[test]
    fn two_director_tables_rejected() {
        let db = Database {
            name: "D".into(),
            family: "F".into(),
            tables: vec![director_table("Object"), director_table("Object2")],
        };
        assert_eq!(
            db.validate(),
            Err(SchemaError::MultipleDirectorTables {
                database: "D".into(),
                first: "Object".into(),
                second: "Object2".into(),
            })
        );
    }

    #[test]
    fn dependent_table_missing_director_key_column_rejected() {
        let db = Database {
            name: "D".into(),
            family: "F".into(),
            tables: vec![
                director_table("Object"),
                dependent_table("Source", "objectId", &["flux"]),
            ],
        };
        assert_eq!(
            db.validate(),
            Err(SchemaError::DirectorKeyMissingColumn {
                database: "D".into(),
                table: "Source".into(),
                column: "objectId".into(),
            })
        );
    }

    #[test]
    fn empty_family_rejected() {
        let db = Database {
            name: "D".into(),
            family: "".into(),
            tables: vec![],
        };
        assert_eq!(
            db.validate(),
            Err(SchemaError::UnresolvableFamily { database: "D".into() })
        );
    }
}
