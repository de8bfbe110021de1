use crate::error::{ErrorDetail, Result};
use crate::value::Source;

/// A textual data format values can be deserialized from.
pub trait Format: Sized {
    /// The data format's error type.
    type Error: serde::de::Error + ErrorDetail + 'static;

    /// Parses `string` as the data format `Self` into a `T`.
    fn from_str<T: serde::de::DeserializeOwned>(string: &str) -> Result<T, Self::Error>;

    /// Reads `input` as text and parses it.
    fn read<I: Source, T: serde::de::DeserializeOwned>(input: I) -> Result<T> {
        let input = input.read_text()?;
        Ok(Self::from_str(&input)?)
    }
}

macro_rules! impl_format {
    ($($name:ident : $func:expr, $E:ty);* $(;)?) => ($(
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl Format for $name {
            type Error = $E;

            fn from_str<T: serde::de::DeserializeOwned>(s: &str) -> Result<T, $E> {
                $func(s)
            }
        }
    )*);
}

impl_format! {
    Toml: toml::from_str, toml::de::Error;
    Json: serde_json::from_str, serde_json::Error;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Dict, Value};

    #[test]
    fn formats_read_any_source() {
        let toml: Dict = Toml::read("title = 'Home'").unwrap();
        assert_eq!(toml["title"], Value::from("Home"));

        let json: Dict = Json::read(Value::from(b"{\"n\": 3}".to_vec())).unwrap();
        assert_eq!(json["n"], Value::from(3u8));

        assert!(Json::read::<_, Dict>(Value::from(4u8)).is_err());
        assert!(Toml::read::<_, Dict>("title = ").is_err());
    }
}
