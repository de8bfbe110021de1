use std::collections::VecDeque;

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};

use crate::markdown::{Context, Events, Extension};
use crate::markdown::extension::substr;
use crate::value::{Dict, Value};

/// Replaces `@name` in text with the value of `name` in the rendering
/// environment.
///
/// A variable starts at any `@` and runs over alphanumerics, `_` and `-`, so
/// `me@name` substitutes `name` too. Variables that aren't set, or are null,
/// are left as written. Code is never touched.
#[derive(Debug, Default, Clone)]
pub struct Variables;

impl Extension for Variables {
    fn remap<'a>(&'a self, events: Events<'a>, ctxt: &'a Context<'_>) -> Events<'a> {
        if ctxt.env().is_empty() {
            return events;
        }

        Box::new(VarIterator {
            inner: events,
            env: ctxt.env(),
            in_code: false,
            pending: VecDeque::new(),
        })
    }
}

struct VarIterator<'a> {
    inner: Events<'a>,
    env: &'a Dict,
    in_code: bool,
    pending: VecDeque<Event<'a>>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Finds the next variable in `text` at or after `from`, returning its range,
/// `@` included, and its name.
fn next_variable(text: &str, from: usize) -> Option<(usize, usize, &str)> {
    let mut search = from;
    while let Some(i) = memchr::memchr(b'@', text[search..].as_bytes()).map(|i| search + i) {
        search = i + 1;
        let len = text[i + 1..].find(|c: char| !is_name_char(c)).unwrap_or(text.len() - i - 1);
        if len > 0 {
            return Some((i, i + 1 + len, &text[i + 1..i + 1 + len]));
        }
    }

    None
}

impl<'a> VarIterator<'a> {
    fn expand(&mut self, text: CowStr<'a>) {
        let mut last = 0;
        let mut from = 0;
        while let Some((start, end, name)) = next_variable(&text, from) {
            from = end;
            let value = match self.env.get(name) {
                Some(Value::Null) | None => continue,
                Some(value) => value.to_string(),
            };

            if start > last {
                self.pending.push_back(Event::Text(substr(&text, last..start)));
            }

            self.pending.push_back(Event::Text(value.into()));
            last = end;
        }

        if last == 0 {
            self.pending.push_back(Event::Text(text));
        } else if last < text.len() {
            self.pending.push_back(Event::Text(substr(&text, last..text.len())));
        }
    }
}

impl<'a> Iterator for VarIterator<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        match self.inner.next()? {
            event @ Event::Start(Tag::CodeBlock(_)) => {
                self.in_code = true;
                Some(event)
            }
            event @ Event::End(TagEnd::CodeBlock) => {
                self.in_code = false;
                Some(event)
            }
            Event::Text(text) if !self.in_code && text.contains('@') => {
                self.expand(text);
                self.pending.pop_front()
            }
            event => Some(event),
        }
    }
}
