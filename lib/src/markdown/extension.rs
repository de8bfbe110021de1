use std::borrow::Cow;
use std::fmt;
use std::ops::Range;

use pulldown_cmark::{CowStr, Event};

use crate::error::Result;
use crate::value::{Dict, Value};

pub type Events<'a> = Box<dyn Iterator<Item = Event<'a>> + 'a>;

/// A parser extension: rewrites source text before parsing, events after, or
/// both.
///
/// Extensions run in registration order. Each render gets a fresh
/// [`Context`], so state recorded while preprocessing one document is only
/// visible to that document's `remap`.
pub trait Extension: fmt::Debug + Send + Sync {
    #[inline(always)]
    fn preprocess<'a>(&self, input: &'a str, _ctxt: &mut Context<'_>) -> Result<Cow<'a, str>> {
        Ok(Cow::Borrowed(input))
    }

    #[inline(always)]
    fn remap<'a>(&'a self, events: Events<'a>, _ctxt: &'a Context<'_>) -> Events<'a> {
        events
    }
}

/// Per-render state shared by extensions.
#[derive(Debug)]
pub struct Context<'e> {
    env: &'e Dict,
    state: Dict,
}

impl<'e> Context<'e> {
    pub fn new(env: &'e Dict) -> Self {
        Context { env, state: Dict::new() }
    }

    /// The rendering environment of the current file.
    pub fn env(&self) -> &'e Dict {
        self.env
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.state.get_mut(key)
    }

    pub fn set<V: Into<Value>>(&mut self, key: &str, value: V) {
        self.state.insert(key.into(), value.into());
    }
}

/// The `range` of `text`, borrowing from the source document if `text` does.
pub(crate) fn substr<'a>(text: &CowStr<'a>, range: Range<usize>) -> CowStr<'a> {
    match text {
        CowStr::Borrowed(s) => {
            let s: &'a str = *s;
            CowStr::Borrowed(&s[range])
        }
        _ => text[range].to_string().into(),
    }
}
