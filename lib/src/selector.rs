//! Dotted field selectors with wildcard segments.
//!
//! A selector such as `excerpt.*.subfield` names values nested inside a
//! record. Segments are separated by `.`:
//!
//!   * `name` descends into the field `name`; on arrays, a numeric `name`
//!     descends into that index.
//!   * `*` descends into every key of a dictionary or every index of an array.
//!   * `**` descends through zero or more levels, so `**.subfield` names every
//!     `subfield` at any depth.
//!
//! Resolving a selector against a record yields the concrete paths, in
//! document order, that exist in that record right now.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::error::ErrorDetail;
use crate::value::{Dict, Value};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Key(Arc<str>),
    Wildcard,
    DeepWildcard,
}

/// One step of a resolved, concrete path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Step {
    Key(Arc<str>),
    Index(usize),
}

pub type FieldPath = Vec<Step>;

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Key(key) => fmt::Display::fmt(&key, f),
            Step::Index(i) => fmt::Display::fmt(&i, f),
        }
    }
}

/// Formats a concrete path in selector syntax, e.g. `excerpt.0.subfield`.
pub fn display_path(path: &[Step]) -> String {
    path.iter()
        .map(|step| step.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: Arc<str>,
    segments: Vec<Segment>,
}

/// A selector string that can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSelector {
    pub selector: String,
    pub reason: &'static str,
    /// Index of the offending segment, if any.
    pub segment: Option<usize>,
}

impl fmt::Display for InvalidSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid field selector `{}`: {}", self.selector, self.reason)
    }
}

impl std::error::Error for InvalidSelector { }

impl ErrorDetail for InvalidSelector {
    fn context(&self) -> Vec<(Option<String>, String)> {
        match self.segment {
            Some(i) => vec![(Some("segment".into()), (i + 1).to_string())],
            None => vec![],
        }
    }
}

impl Selector {
    /// Parses a dotted selector.
    ///
    /// ```rust
    /// use marksmith::selector::{Selector, Segment};
    ///
    /// let selector = Selector::parse("excerpt.*.subfield").unwrap();
    /// assert_eq!(selector.segments()[1], Segment::Wildcard);
    ///
    /// assert!(Selector::parse("").is_err());
    /// assert!(Selector::parse("excerpt..subfield").is_err());
    /// assert!(Selector::parse("ex*").is_err());
    /// ```
    pub fn parse(source: &str) -> Result<Self, InvalidSelector> {
        let invalid = |reason, segment| InvalidSelector {
            selector: source.to_string(),
            reason,
            segment,
        };

        if source.is_empty() {
            return Err(invalid("selector is empty", None));
        }

        let segments = source.split('.')
            .enumerate()
            .map(|(i, segment)| match segment {
                "" => Err(invalid("segment is empty", Some(i))),
                "*" => Ok(Segment::Wildcard),
                "**" => Ok(Segment::DeepWildcard),
                s if s.contains('*') => Err(invalid("`*` must be a whole segment", Some(i))),
                s => Ok(Segment::Key(s.into())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Selector { source: source.into(), segments })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolves `self` against `record`, returning every existing path it
    /// names. Paths are unique; missing keys simply contribute nothing.
    pub fn resolve(&self, record: &Dict) -> Vec<FieldPath> {
        let mut resolver = Resolver::default();
        resolver.walk(Node::Dict(record), &self.segments);
        resolver.paths
    }
}

impl FromStr for Selector {
    type Err = InvalidSelector;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Selector::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.source, f)
    }
}

#[derive(Clone, Copy)]
enum Node<'v> {
    Dict(&'v Dict),
    Array(&'v [Value]),
    Leaf,
}

impl<'v> Node<'v> {
    fn of(value: &'v Value) -> Self {
        match value {
            Value::Dict(dict) => Node::Dict(dict),
            Value::Array(array) => Node::Array(array),
            _ => Node::Leaf,
        }
    }

    fn child(self, key: &Arc<str>) -> Option<(Step, &'v Value)> {
        match self {
            Node::Dict(dict) => dict.get(&**key).map(|v| (Step::Key(key.clone()), v)),
            Node::Array(array) => {
                let i: usize = key.parse().ok()?;
                array.get(i).map(|v| (Step::Index(i), v))
            }
            Node::Leaf => None,
        }
    }

    fn children(self) -> Box<dyn Iterator<Item = (Step, &'v Value)> + 'v> {
        match self {
            Node::Dict(dict) => Box::new(dict.iter().map(|(k, v)| (Step::Key(k.clone()), v))),
            Node::Array(array) => Box::new(array.iter().enumerate().map(|(i, v)| (Step::Index(i), v))),
            Node::Leaf => Box::new(std::iter::empty()),
        }
    }
}

#[derive(Default)]
struct Resolver {
    prefix: FieldPath,
    paths: Vec<FieldPath>,
    seen: FxHashSet<FieldPath>,
}

impl Resolver {
    fn walk(&mut self, node: Node<'_>, segments: &[Segment]) {
        let Some((segment, rest)) = segments.split_first() else {
            if !self.prefix.is_empty() && self.seen.insert(self.prefix.clone()) {
                self.paths.push(self.prefix.clone());
            }

            return;
        };

        match segment {
            Segment::Key(key) => {
                if let Some((step, child)) = node.child(key) {
                    self.descend(step, child, rest);
                }
            }
            Segment::Wildcard => {
                for (step, child) in node.children() {
                    self.descend(step, child, rest);
                }
            }
            Segment::DeepWildcard => {
                self.walk(node, rest);
                for (step, child) in node.children() {
                    self.descend(step, child, segments);
                }
            }
        }
    }

    fn descend(&mut self, step: Step, child: &Value, segments: &[Segment]) {
        self.prefix.push(step);
        self.walk(Node::of(child), segments);
        self.prefix.pop();
    }
}

/// Returns a mutable reference to the value at `path` in `record`.
///
/// Shared containers along the path are copied on write.
pub fn get_mut<'v>(record: &'v mut Dict, path: &[Step]) -> Option<&'v mut Value> {
    let (Step::Key(first), rest) = path.split_first()? else {
        return None;
    };

    let mut value = record.get_mut(&**first)?;
    for step in rest {
        value = match step {
            Step::Key(key) => value.as_dict_mut()?.get_mut(&**key)?,
            Step::Index(i) => value.as_vec_mut()?.get_mut(*i)?,
        };
    }

    Some(value)
}
