use std::{fs, io};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::fmt::Debug;

use crate::error::{Result, Chainable};
use crate::value::Value;

/// Something a value can be written to.
pub trait Sink: Debug {
    fn write<V: Into<Value> + 'static>(&self, value: V) -> Result<()> {
        self.write_value(value.into())
    }

    fn write_value(&self, value: Value) -> Result<()>;
}

fn write_value(to: &mut dyn io::Write, value: &Value) -> Result<()> {
    match value {
        Value::Null => Ok(()),
        Value::String(s) => Ok(to.write_all(s.as_bytes())?),
        Value::Bytes(b) => Ok(to.write_all(b)?),
        Value::Bool(_) | Value::Num(_) => Ok(write!(to, "{value}")?),
        Value::Array(array) => array.iter().try_for_each(|v| write_value(to, v)),
        Value::Dict(_) => err!("file sink does not support dictionary writes"),
    }
}

impl Sink for fs::File {
    fn write_value(&self, value: Value) -> Result<()> {
        let mut file = io::BufWriter::new(self);
        write_value(&mut file, &value)?;
        Ok(file.flush()?)
    }
}

impl Sink for &Path {
    fn write_value(&self, value: Value) -> Result<()> {
        if let Some(parent) = self.parent() {
            fs::create_dir_all(parent).chain_with(|| error! {
                "failed to create output directory",
                "directory" => parent.display()
            })?;
        }

        fs::File::create(self)
            .chain(error! {
                "failed to open/create file for writing",
                "file path" => self.display()
            })?
            .write_value(value)
    }
}

impl Sink for PathBuf {
    fn write_value(&self, value: Value) -> Result<()> {
        self.as_path().write_value(value)
    }
}

impl<T: Sink> Sink for &T {
    fn write_value(&self, value: Value) -> Result<()> {
        T::write_value(self, value)
    }
}
