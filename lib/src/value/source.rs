use std::fs;
use std::path::Path;
use std::fmt::Debug;

use either::Either;

use crate::error::{Result, Chainable};
use crate::value::Value;

/// Something a value can be read from.
pub trait Source: Debug {
    type Value: Into<Value> + 'static;

    fn read(self) -> Result<Self::Value>;

    /// Reads the value and converts it into text, failing if it isn't
    /// textual.
    fn read_text(self) -> Result<String> where Self: Sized {
        let value: Value = self.read()?.into();
        match value {
            Value::String(s) => Ok(s.to_string()),
            Value::Bytes(b) => String::from_utf8(b.to_vec())
                .map_err(|_| error!("input is not valid UTF-8")),
            other => err! {
                "invalid input value type",
                "expected" => "text",
                "actual type" => other.kind(),
            }
        }
    }

    fn path(&self) -> Option<&Path> {
        None
    }
}

impl Source for Value {
    type Value = Self;

    fn read(self) -> Result<Self::Value> {
        Ok(self)
    }
}

impl Source for &str {
    type Value = String;

    fn read(self) -> Result<Self::Value> {
        Ok(self.to_owned())
    }
}

impl Source for &Path {
    type Value = Either<String, Vec<u8>>;

    fn read(self) -> Result<Self::Value> {
        let data = fs::read(self).chain(error! {
            "failed to read file",
            "file path" => self.display()
        })?;

        let value = String::from_utf8(data)
            .map(Either::Left)
            .unwrap_or_else(|e| Either::Right(e.into_bytes()));

        Ok(value)
    }

    fn path(&self) -> Option<&Path> {
        Some(self)
    }
}

impl<A, B> From<Either<A, B>> for Value where Value: From<A>, Value: From<B> {
    fn from(value: Either<A, B>) -> Self {
        either::for_both!(value, v => v.into())
    }
}
