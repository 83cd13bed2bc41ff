use std::fmt::{Display, Formatter};
use std::str::FromStr;

macro_rules! newtype_id {
    ($name:ident, $repr:ty, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            serde::Serialize,
            serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(value: $repr) -> Self {
                Self(value)
            }

            pub const fn get(&self) -> $repr {
                self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                Display::fmt(&self.0, f)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<$repr> for $name {
            fn from(value: $repr) -> Self {
                Self(value)
            }
        }
    };
}

newtype_id!(JobId, u64, "Globally unique id of a [`crate::Job`].");
newtype_id!(RequestId, u64, "Globally unique id of a [`crate::Request`].");
newtype_id!(
    TransactionId,
    i32,
    "Id of a bulk-ingest [`crate::Transaction`], assigned by the store on creation."
);
newtype_id!(
    ContributionId,
    i64,
    "Id of a single file-worth-of-rows [`crate::Contribution`]."
);
newtype_id!(ChunkNumber, u32, "Integer identifying one horizontal partition of a partitioned table.");
newtype_id!(ControllerId, u64, "Id of a registered `Controller` process.");

/// A worker's unique, immutable name (e.g. `"db01"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct WorkerName(String);

impl WorkerName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for WorkerName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkerName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

macro_rules! newtype_name {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(
            Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
        )]
        pub struct $name(String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }
    };
}

newtype_name!(FamilyName, "Name of a [`crate::DatabaseFamily`].");
newtype_name!(DatabaseName, "Name of a [`crate::Database`].");
newtype_name!(TableName, "Name of a [`crate::Table`] within a database.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_roundtrips_through_string() {
        let id = JobId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<JobId>().unwrap(), id);
    }

    #[test]
    fn names_compare_by_value() {
        assert_eq!(WorkerName::from("w1"), WorkerName::from("w1".to_string()));
        assert!(WorkerName::from("w1") < WorkerName::from("w2"));
    }
}
