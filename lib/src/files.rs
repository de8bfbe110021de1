use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use derive_more::{Deref, DerefMut, From};
use rayon::prelude::*;
use serde::{Serialize, Deserialize};

use crate::error::{Error, Result, Chainable};
use crate::value::{Dict, Format, Sink, Source, Toml, Value};

/// The field holding a file's body.
pub const CONTENTS: &str = "contents";

/// One file in a build: its fields keyed by name.
///
/// The body lives in the [`CONTENTS`] field, usually as [`Value::Bytes`];
/// front matter and anything plugins attach live alongside it.
#[derive(Debug, Clone, Default, PartialEq, Deref, DerefMut, From, Serialize, Deserialize)]
pub struct FileRecord(Dict);

impl FileRecord {
    pub fn new() -> Self {
        FileRecord::default()
    }

    /// A record whose only field is `contents`.
    pub fn with_contents<V: Into<Value>>(contents: V) -> Self {
        let mut record = FileRecord::new();
        record.insert(CONTENTS.into(), contents.into());
        record
    }

    pub fn contents(&self) -> Option<&Value> {
        self.get(CONTENTS)
    }

    /// Builds a record from raw file data, lifting a leading `+++`-delimited
    /// TOML front matter block into fields.
    pub fn parse(data: Vec<u8>) -> Result<Self> {
        let split = std::str::from_utf8(&data).ok().and_then(split_front_matter);
        let Some((front_matter, body)) = split else {
            return Ok(FileRecord::with_contents(data));
        };

        let fields: Dict = Toml::from_str(front_matter)
            .chain(error!("invalid TOML front matter"))?;

        let mut record = FileRecord::from(fields);
        record.insert(CONTENTS.into(), Value::from(body.as_bytes()));
        Ok(record)
    }
}

fn split_front_matter(input: &str) -> Option<(&str, &str)> {
    const FENCE: &str = "+++";

    let rest = input.strip_prefix(FENCE)?;
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == FENCE {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }

        offset += line.len();
    }

    None
}

/// A build's files, keyed by path relative to the source directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Files {
    map: BTreeMap<PathBuf, FileRecord>,
}

impl Files {
    pub fn new() -> Self {
        Files::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn insert<P: Into<PathBuf>>(&mut self, path: P, record: FileRecord) -> Option<FileRecord> {
        self.map.insert(path.into(), record)
    }

    pub fn get<P: AsRef<Path>>(&self, path: P) -> Option<&FileRecord> {
        self.map.get(path.as_ref())
    }

    pub fn get_mut<P: AsRef<Path>>(&mut self, path: P) -> Option<&mut FileRecord> {
        self.map.get_mut(path.as_ref())
    }

    pub fn remove<P: AsRef<Path>>(&mut self, path: P) -> Option<FileRecord> {
        self.map.remove(path.as_ref())
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        self.map.contains_key(path.as_ref())
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.map.keys().map(|p| p.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &FileRecord)> {
        self.map.iter().map(|(p, r)| (p.as_path(), r))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Path, &mut FileRecord)> {
        self.map.iter_mut().map(|(p, r)| (p.as_path(), r))
    }

    pub fn par_iter_mut(&mut self) -> impl ParallelIterator<Item = (&Path, &mut FileRecord)> {
        self.map.par_iter_mut().map(|(p, r)| (p.as_path(), r))
    }

    /// Moves the record at `from` to `to`, replacing any record already at
    /// `to`. Returns `false` if there's no record at `from`.
    pub fn rename<P: AsRef<Path>, Q: Into<PathBuf>>(&mut self, from: P, to: Q) -> bool {
        let from = from.as_ref();
        let Some(record) = self.map.remove(from) else {
            return false;
        };

        let to = to.into();
        if self.map.contains_key(&to) {
            tracing::warn!(from = %from.display(), to = %to.display(), "rename overwrites existing file");
        }

        self.map.insert(to, record);
        true
    }

    /// Reads every non-hidden file under `root` into a record keyed by its
    /// path relative to `root`.
    pub fn load<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref();
        let walker = jwalk::WalkDir::new(root)
            .follow_links(true)
            .skip_hidden(true)
            .sort(true);

        let mut files = Files::new();
        for entry in walker {
            let entry = entry.map_err(Error::from_std)
                .chain_with(|| error!("failed to walk source directory", "root" => root.display()))?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(root)?.to_path_buf();
            let data = match path.as_path().read()? {
                either::Either::Left(string) => string.into_bytes(),
                either::Either::Right(bytes) => bytes,
            };

            let record = FileRecord::parse(data).chain_with(|| error! {
                "failed to load file",
                "path" => relative.display(),
            })?;

            files.insert(relative, record);
        }

        tracing::debug!(root = %root.display(), count = files.len(), "loaded files");
        Ok(files)
    }

    /// Writes each record's `contents` to `root` joined with its path.
    /// Records without contents are skipped.
    pub fn write<P: AsRef<Path>>(&self, root: P) -> Result<()> {
        let root = root.as_ref();
        for (path, record) in self.iter() {
            let Some(contents) = record.contents() else {
                tracing::debug!(path = %path.display(), "skipping file without contents");
                continue;
            };

            root.join(path).write_value(contents.clone())?;
        }

        Ok(())
    }
}

impl<P: Into<PathBuf>> FromIterator<(P, FileRecord)> for Files {
    fn from_iter<I: IntoIterator<Item = (P, FileRecord)>>(iter: I) -> Self {
        Files { map: iter.into_iter().map(|(p, r)| (p.into(), r)).collect() }
    }
}

impl IntoIterator for Files {
    type Item = (PathBuf, FileRecord);
    type IntoIter = std::collections::btree_map::IntoIter<PathBuf, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.into_iter()
    }
}
