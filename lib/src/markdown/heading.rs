use std::collections::VecDeque;

use pulldown_cmark::{CowStr, Event, Tag, TagEnd};
use rustc_hash::FxHashMap;

use crate::markdown::{Context, Events, Extension};

/// Gives every heading without an explicit id one derived from its text.
///
/// Ids are slugs of the heading's text. An id already used in the document,
/// explicit or derived, gets the first free `-1`, `-2`, ... suffix.
#[derive(Debug, Default, Clone)]
pub struct AutoHeading;

struct HeadingIterator<'a> {
    stack: VecDeque<Event<'a>>,
    /// Every id emitted so far, mapped to the last suffix tried for it.
    seen: FxHashMap<String, usize>,
    inner: Events<'a>,
}

impl HeadingIterator<'_> {
    fn unique_id(&mut self, text: &str) -> String {
        let slug = crate::util::slugify(text);
        let id = match self.seen.get(&slug).copied() {
            None => slug,
            Some(mut n) => loop {
                n += 1;
                let candidate = format!("{slug}-{n}");
                if !self.seen.contains_key(&candidate) {
                    self.seen.insert(slug, n);
                    break candidate;
                }
            }
        };

        self.seen.entry(id.clone()).or_insert(0);
        id
    }
}

impl<'a> Iterator for HeadingIterator<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.stack.pop_front() {
            return Some(event);
        }

        match self.inner.next()? {
            Event::Start(Tag::Heading { level, id: None, classes, attrs }) => {
                let mut text = String::new();
                loop {
                    let event = self.inner.next()?;
                    match event {
                        Event::Text(ref s) | Event::Code(ref s) => text.push_str(s),
                        Event::SoftBreak | Event::HardBreak => text.push(' '),
                        Event::End(TagEnd::Heading(..)) => break,
                        _ => {}
                    }

                    self.stack.push_back(event);
                }

                let id = self.unique_id(&text);
                let tag = Tag::Heading { level, id: Some(id.into()), classes, attrs };
                self.stack.push_back(Event::End(TagEnd::Heading(level)));
                Some(Event::Start(tag))
            },
            Event::Start(Tag::Heading { level, id: Some(id), classes, attrs }) => {
                self.seen.entry(id.to_string()).or_insert(0);
                Some(Event::Start(Tag::Heading { level, id: Some(id), classes, attrs }))
            }
            event => Some(event)
        }
    }
}

impl Extension for AutoHeading {
    fn remap<'a>(&'a self, events: Events<'a>, _: &'a Context<'_>) -> Events<'a> {
        Box::new(HeadingIterator {
            seen: FxHashMap::default(),
            inner: events,
            stack: VecDeque::with_capacity(4),
        })
    }
}

/// Prepends an empty `<a class="anchor">` linking to the heading to every
/// heading that has an id. Register after [`AutoHeading`].
#[derive(Debug, Default, Clone)]
pub struct HeadingAnchor;

struct AnchorIterator<'a> {
    pending: Option<CowStr<'a>>,
    inner: Events<'a>,
}

impl<'a> Iterator for AnchorIterator<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(id) = self.pending.take() {
            let html = format!(r##"<a class="anchor" title="anchor" href="#{id}"></a>"##);
            return Some(Event::InlineHtml(html.into()));
        }

        let event = self.inner.next()?;
        if let Event::Start(Tag::Heading { id: Some(ref id), .. }) = event {
            self.pending = Some(id.clone());
        }

        Some(event)
    }
}

impl Extension for HeadingAnchor {
    fn remap<'a>(&'a self, events: Events<'a>, _: &'a Context<'_>) -> Events<'a> {
        Box::new(AnchorIterator {
            inner: events,
            pending: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markdown::{Parser, ParserOptions, Preset};

    #[test]
    fn ids_are_slugs_and_unique() {
        let mut parser = Parser::new(Preset::Default);
        parser.use_extension(AutoHeading);

        let html = parser.render("# Hello, World!\n\n## Hello `World`\n\n# Hello, world").unwrap();
        assert_eq!(html, "<h1 id=\"hello-world\">Hello, World!</h1>\n\
            <h2 id=\"hello-world-1\">Hello <code>World</code></h2>\n\
            <h1 id=\"hello-world-2\">Hello, world</h1>\n");
    }

    #[test]
    fn suffixed_ids_never_collide() {
        let mut parser = Parser::new(Preset::Default);
        parser.use_extension(AutoHeading);

        let html = parser.render("# Foo\n\n# Foo\n\n# Foo 1").unwrap();
        assert_eq!(html, "<h1 id=\"foo\">Foo</h1>\n\
            <h1 id=\"foo-1\">Foo</h1>\n\
            <h1 id=\"foo-1-1\">Foo 1</h1>\n");
    }

    #[test]
    fn explicit_ids_are_reserved() {
        let mut parser = Parser::new(Preset::Default);
        parser.use_extension(AutoHeading);
        parser.set(&ParserOptions { heading_attributes: Some(true), ..Default::default() });

        let html = parser.render("# Top {#foo}\n\n# Foo\n\n# Foo").unwrap();
        assert_eq!(html.matches("id=\"foo\"").count(), 1);
        assert_eq!(html.matches("id=\"foo-1\"").count(), 1);
        assert_eq!(html.matches("id=\"foo-2\"").count(), 1);
    }

    #[test]
    fn line_breaks_separate_words() {
        let mut parser = Parser::new(Preset::Default);
        parser.use_extension(AutoHeading);

        let html = parser.render("Hello\nWorld\n===").unwrap();
        assert_eq!(html, "<h1 id=\"hello-world\">Hello\nWorld</h1>\n");
    }

    #[test]
    fn anchors_follow_ids() {
        let mut parser = Parser::new(Preset::Default);
        parser.use_extension(AutoHeading).use_extension(HeadingAnchor);

        let html = parser.render("## Intro").unwrap();
        assert_eq!(html, "<h2 id=\"intro\"><a class=\"anchor\" title=\"anchor\" href=\"#intro\"></a>Intro</h2>\n");
    }
}
