use std::borrow::Cow;
use std::cmp::Reverse;
use std::collections::VecDeque;

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use pulldown_cmark_escape::escape_html;

use crate::error::Result;
use crate::markdown::{Context, Events, Extension};
use crate::markdown::extension::substr;
use crate::util::word_matches;
use crate::value::{Dict, Value};

const STATE_KEY: &str = "abbreviations";

/// Abbreviation definitions like `*[HTML]: Hyper Text Markup Language`.
///
/// Definition lines outside of code blocks are removed from the document,
/// and every whole-word
/// occurrence of a defined abbreviation outside of code is wrapped in an
/// `<abbr>` element titled with its definition. The first definition of an
/// abbreviation wins.
#[derive(Debug, Default, Clone)]
pub struct Abbreviations;

fn parse_definition(line: &str) -> Option<(&str, &str)> {
    let (key, title) = line.strip_prefix("*[")?.split_once("]:")?;
    let key = key.trim();
    (!key.is_empty() && !key.contains(']')).then(|| (key, title.trim()))
}

/// The opening run of a code fence: its character, length and the rest of
/// the line.
fn fence(line: &str) -> Option<(u8, usize, &str)> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    let line = &line[indent..];
    let ch = *line.as_bytes().first()?;
    let len = line.bytes().take_while(|&b| b == ch).count();
    (indent < 4 && (ch == b'`' || ch == b'~') && len >= 3).then(|| (ch, len, &line[len..]))
}

fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for b in line.bytes() {
        match b {
            b' ' => width += 1,
            b'\t' => width += 4 - width % 4,
            _ => break,
        }
    }

    width
}

/// Tracks which lines of a document are code, where definitions don't count.
#[derive(Default)]
struct CodeLines {
    fence: Option<(u8, usize)>,
    indented: bool,
    paragraph: bool,
}

impl CodeLines {
    fn is_code(&mut self, line: &str) -> bool {
        let line = line.trim_end_matches(['\n', '\r']);
        if let Some((ch, len)) = self.fence {
            if let Some((c, n, rest)) = fence(line) {
                if c == ch && n >= len && rest.trim().is_empty() {
                    self.fence = None;
                }
            }

            return true;
        }

        if line.trim().is_empty() {
            self.paragraph = false;
            return self.indented;
        }

        if indent_width(line) >= 4 && !self.paragraph {
            self.indented = true;
            return true;
        }

        self.indented = false;
        if let Some((ch, len, _)) = fence(line) {
            self.fence = Some((ch, len));
            self.paragraph = false;
            return true;
        }

        self.paragraph = true;
        false
    }
}

impl Extension for Abbreviations {
    fn preprocess<'a>(&self, input: &'a str, ctxt: &mut Context<'_>) -> Result<Cow<'a, str>> {
        let mut definitions = Dict::new();
        let mut output = Cow::Borrowed(input);
        let mut offset = 0;
        let mut code = CodeLines::default();
        for line in input.split_inclusive('\n') {
            let definition = match code.is_code(line) {
                true => None,
                false => parse_definition(line),
            };

            match definition {
                Some((key, title)) => {
                    definitions.entry(key.into()).or_insert_with(|| Value::from(title));
                    if let Cow::Borrowed(_) = output {
                        output = Cow::Owned(input[..offset].to_string());
                    }
                }
                None => if let Cow::Owned(buf) = &mut output {
                    buf.push_str(line);
                }
            }

            offset += line.len();
        }

        if definitions.is_empty() {
            return Ok(output);
        }

        match ctxt.get_mut(STATE_KEY).and_then(|v| v.as_dict_mut()) {
            Some(existing) => {
                for (key, title) in definitions {
                    existing.entry(key).or_insert(title);
                }
            }
            None => ctxt.set(STATE_KEY, definitions),
        }

        Ok(output)
    }

    fn remap<'a>(&'a self, events: Events<'a>, ctxt: &'a Context<'_>) -> Events<'a> {
        let Some(definitions) = ctxt.get(STATE_KEY).and_then(|v| v.as_dict()) else {
            return events;
        };

        let definitions = definitions.iter()
            .filter_map(|(key, title)| Some((&**key, title.as_str()?)))
            .collect();

        Box::new(AbbrIterator {
            inner: events,
            definitions,
            in_code: false,
            pending: VecDeque::new(),
        })
    }
}

struct AbbrIterator<'a> {
    inner: Events<'a>,
    definitions: Vec<(&'a str, &'a str)>,
    in_code: bool,
    pending: VecDeque<Event<'a>>,
}

#[allow(unused_must_use)]
fn abbr(key: &str, title: &str) -> String {
    let mut html = String::from("<abbr title=\"");
    escape_html(&mut html, title);
    html.push_str("\">");
    escape_html(&mut html, key);
    html.push_str("</abbr>");
    html
}

impl<'a> AbbrIterator<'a> {
    fn expand(&mut self, text: CowStr<'a>) {
        let mut last = 0;
        loop {
            let next = self.definitions.iter()
                .filter_map(|&(key, title)| {
                    let i = word_matches(&text[last..], key).next()?;
                    Some((last + i, key, title))
                })
                .min_by_key(|&(i, key, _)| (i, Reverse(key.len())));

            let Some((i, key, title)) = next else {
                break;
            };

            if i > last {
                self.pending.push_back(Event::Text(substr(&text, last..i)));
            }

            self.pending.push_back(Event::InlineHtml(abbr(key, title).into()));
            last = i + key.len();
        }

        if last == 0 {
            self.pending.push_back(Event::Text(text));
        } else if last < text.len() {
            self.pending.push_back(Event::Text(substr(&text, last..text.len())));
        }
    }
}

impl<'a> Iterator for AbbrIterator<'a> {
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
            Event::Text(text) if !self.in_code => {
                self.expand(text);
                self.pending.pop_front()
            }
            event => Some(event),
        }
    }
}
