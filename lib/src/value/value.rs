use std::fmt;
use std::sync::Arc;
use std::collections::BTreeMap;

use serde::{Serialize, Deserialize};

pub type Dict<K = Arc<str>, V = Value> = BTreeMap<K, V>;

/// Any value a file record can hold.
///
/// Containers are reference counted: cloning a `Value` is cheap, and mutation
/// through [`Value::as_dict_mut()`] or [`Value::as_vec_mut()`] copies on
/// write.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Num(Num),
    String(Arc<str>),
    #[serde(skip_deserializing)]
    Bytes(Arc<[u8]>),
    Array(Arc<Vec<Value>>),
    Dict(Arc<Dict>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(&**b),
            _ => None
        }
    }

    /// Returns the value as text: a string, or bytes that are valid UTF-8.
    ///
    /// ```rust
    /// use marksmith::value::Value;
    ///
    /// assert_eq!(Value::from("# hi").as_text(), Some("# hi"));
    /// assert_eq!(Value::from(b"# hi".to_vec()).as_text(), Some("# hi"));
    /// assert_eq!(Value::from(vec![0xffu8, 0xfe]).as_text(), None);
    /// assert_eq!(Value::from(12u8).as_text(), None);
    /// ```
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            Value::Bytes(b) => std::str::from_utf8(b).ok(),
            _ => None
        }
    }

    /// Replaces the text of a textual value, keeping its kind: strings stay
    /// strings and bytes stay bytes. Returns `false` and leaves `self`
    /// untouched if `self` isn't textual.
    pub fn replace_text(&mut self, text: String) -> bool {
        match self {
            Value::String(s) => *s = text.into(),
            Value::Bytes(b) if std::str::from_utf8(b).is_ok() => *b = text.into_bytes().into(),
            _ => return false,
        }

        true
    }

    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::Array(v) => Some(v.as_slice()),
            _ => None
        }
    }

    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Value::Dict(v) => Some(&**v),
            _ => None
        }
    }

    pub fn as_vec_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            Value::Array(v) => Some(Arc::make_mut(v)),
            _ => None
        }
    }

    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Value::Dict(v) => Some(Arc::make_mut(v)),
            _ => None
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => fmt::Display::fmt(&b, f),
            Value::Num(n) => fmt::Display::fmt(&n, f),
            Value::String(s) => fmt::Display::fmt(&s, f),
            Value::Bytes(b) => fmt::Display::fmt(&String::from_utf8_lossy(b), f),
            Value::Array(_) | Value::Dict(_) => match serde_json::to_string(self) {
                Ok(json) => fmt::Display::fmt(&json, f),
                Err(_) => Err(fmt::Error),
            }
        }
    }
}

macro_rules! impl_from_primitive {
    ($($T:ty),+ => $E:ident::$kind:ident) => {
        $(
            impl From<$T> for $E {
                fn from(value: $T) -> Self {
                    $E::$kind(value.into())
                }
            }
        )+
    };
}

impl_from_primitive!(bool => Value::Bool);
impl_from_primitive!(&str, String, Arc<str> => Value::String);
impl_from_primitive!(std::borrow::Cow<'_, str> => Value::String);
impl_from_primitive!(&[u8], Vec<u8>, Arc<[u8]> => Value::Bytes);
impl_from_primitive!(Arc<Vec<Value>> => Value::Array);
impl_from_primitive!(Arc<Dict> => Value::Dict);
impl_from_primitive!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64 => Value::Num);

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl<T> From<Option<T>> for Value where Value: From<T> {
    fn from(value: Option<T>) -> Self {
        value.map(Value::from).unwrap_or(Value::Null)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(Arc::new(value))
    }
}

impl From<Dict> for Value {
    fn from(value: Dict) -> Self {
        Value::Dict(Arc::new(value))
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<T: IntoIterator<Item = Value>>(iter: T) -> Self {
        Value::Array(Arc::new(iter.into_iter().collect()))
    }
}

/// A numeric value: unsigned, signed, or floating point.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Num {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn to_f64(self) -> f64 {
        match self {
            Num::UInt(v) => v as f64,
            Num::Int(v) => v as f64,
            Num::Float(v) => v,
        }
    }

    pub fn to_i128(self) -> Option<i128> {
        match self {
            Num::UInt(v) => Some(v as i128),
            Num::Int(v) => Some(v as i128),
            Num::Float(_) => None,
        }
    }
}

impl PartialEq for Num {
    /// ```rust
    /// use marksmith::value::Num;
    ///
    /// assert_eq!(Num::from(-0i8), Num::from(0u8));
    /// assert_eq!(Num::from(10i32), Num::from(10u64));
    /// assert_eq!(Num::from(2.0f64), Num::from(2u8));
    /// assert_ne!(Num::from(-1i8), Num::from(u64::MAX));
    /// ```
    fn eq(&self, other: &Self) -> bool {
        match (self.to_i128(), other.to_i128()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_f64() == other.to_f64(),
        }
    }
}

impl fmt::Display for Num {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Num::UInt(v) => fmt::Display::fmt(&v, f),
            Num::Int(v) => fmt::Display::fmt(&v, f),
            Num::Float(v) => fmt::Display::fmt(&v, f),
        }
    }
}

macro_rules! impl_from_for_num {
    ($($T:ty: $V:ident as $W:ty),* $(,)?) => ($(
        impl From<$T> for Num {
            fn from(value: $T) -> Num {
                Num::$V(value as $W)
            }
        }
    )*)
}

impl_from_for_num! {
    u8: UInt as u64, u16: UInt as u64, u32: UInt as u64, u64: UInt as u64, usize: UInt as u64,
    i8: Int as i64, i16: Int as i64, i32: Int as i64, i64: Int as i64, isize: Int as i64,
    f32: Float as f64, f64: Float as f64,
}
