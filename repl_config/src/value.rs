/// The primitive value kinds a scalar configuration parameter can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigScalar {
    U32(u32),
    U64(u64),
    Bool(bool),
    String(String),
}

impl ConfigScalar {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::U32(v) => *v == 0,
            Self::U64(v) => *v == 0,
            Self::Bool(_) => false,
            Self::String(s) => s.is_empty(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::Bool(_) => "bool",
            Self::String(_) => "string",
        }
    }
}

/// Implemented for every Rust type a caller may `get<T>`/`set<T>` a
/// parameter as. Conversions are infallible in the `From` direction and
/// checked (wrong variant -> type error) in the `TryFrom` direction.
pub trait ConfigValue: Sized {
    fn into_scalar(self) -> ConfigScalar;
    fn from_scalar(scalar: &ConfigScalar) -> Option<Self>;
}

macro_rules! impl_config_value {
    ($ty:ty, $variant:ident) => {
        impl ConfigValue for $ty {
            fn into_scalar(self) -> ConfigScalar {
                ConfigScalar::$variant(self)
            }

            fn from_scalar(scalar: &ConfigScalar) -> Option<Self> {
                match scalar {
                    ConfigScalar::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_config_value!(u32, U32);
impl_config_value!(u64, U64);
impl_config_value!(bool, Bool);
impl_config_value!(String, String);
