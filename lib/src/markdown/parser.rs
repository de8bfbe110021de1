use std::borrow::Cow;
use std::collections::VecDeque;
use std::ops::Range;
use std::sync::Arc;

use pulldown_cmark::{html, CodeBlockKind, Event, Tag, TagEnd};

use crate::error::Result;
use crate::markdown::{Context, Events, Extension};
use crate::markdown::{Options, ParserOptions, Preset, Rule, Rules, Settings};
use crate::value::Dict;

/// A configurable Markdown to HTML renderer.
///
/// Starts from a [`Preset`]; rules can then be switched on and off by name
/// and [`Extension`]s registered, in any order, before rendering.
///
/// ```rust
/// use marksmith::markdown::{Parser, Preset};
///
/// let mut parser = Parser::new(Preset::Zero);
/// assert_eq!(parser.render("*hi*").unwrap(), "<p>*hi*</p>\n");
///
/// parser.enable(["emphasis"])?;
/// assert_eq!(parser.render("*hi*").unwrap(), "<p><em>hi</em></p>\n");
/// # Ok::<(), marksmith::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Parser {
    preset: Preset,
    rules: Rules,
    settings: Settings,
    extensions: Vec<Arc<dyn Extension>>,
}

impl Parser {
    pub fn new(preset: Preset) -> Self {
        Parser {
            preset,
            rules: preset.rules(),
            settings: preset.settings(),
            extensions: vec![],
        }
    }

    /// A parser for `preset` with literal `options` layered on top.
    pub fn with_options(preset: Preset, options: &ParserOptions) -> Self {
        let mut parser = Parser::new(preset);
        parser.set(options);
        parser
    }

    /// Resolves the preset, literal options and rule lists of `options`.
    pub fn from_options(options: &Options) -> Result<Self> {
        let mut parser = Parser::with_options(options.preset, &options.parser);
        parser.enable(&options.enable)?.disable(&options.disable)?;
        Ok(parser)
    }

    pub fn preset(&self) -> Preset {
        self.preset
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn settings(&self) -> Settings {
        self.settings
    }

    pub fn is_enabled(&self, rule: Rule) -> bool {
        self.rules.contains(rule)
    }

    /// Enables the rules named in `names`. Fails without changing anything
    /// if any name is unknown.
    pub fn enable<I>(&mut self, names: I) -> Result<&mut Self>
        where I: IntoIterator, I::Item: AsRef<str>
    {
        for rule in parse_rules(names)? {
            self.rules.insert(rule);
        }

        Ok(self)
    }

    /// Disables the rules named in `names`. Fails without changing anything
    /// if any name is unknown.
    pub fn disable<I>(&mut self, names: I) -> Result<&mut Self>
        where I: IntoIterator, I::Item: AsRef<str>
    {
        for rule in parse_rules(names)? {
            self.rules.remove(rule);
        }

        Ok(self)
    }

    /// Overrides the current settings with every option that's set.
    pub fn set(&mut self, options: &ParserOptions) -> &mut Self {
        self.settings = options.merge(self.settings);
        self
    }

    /// Registers `extension` to run after those already registered.
    pub fn use_extension<E: Extension + 'static>(&mut self, extension: E) -> &mut Self {
        self.extensions.push(Arc::new(extension));
        self
    }

    pub fn extensions(&self) -> &[Arc<dyn Extension>] {
        &self.extensions
    }

    /// Renders `input` with an empty environment.
    pub fn render(&self, input: &str) -> Result<String> {
        self.render_with(input, &Dict::new())
    }

    /// Renders `input`, exposing `env` to extensions.
    pub fn render_with(&self, input: &str, env: &Dict) -> Result<String> {
        let mut ctxt = Context::new(env);
        let mut input = Cow::Borrowed(input);
        for extension in &self.extensions {
            input = match input {
                Cow::Borrowed(input) => extension.preprocess(input, &mut ctxt)?,
                Cow::Owned(input) => {
                    let i = input.as_str();
                    match extension.preprocess(i, &mut ctxt)? {
                        Cow::Borrowed(s) if s.as_ptr() == i.as_ptr() && s.len() == i.len() => Cow::Owned(input),
                        Cow::Borrowed(s) => Cow::Owned(s.to_string()),
                        Cow::Owned(s) => Cow::Owned(s),
                    }
                }
            };
        }

        let options = self.rules.cmark_options() | self.settings.cmark_options();
        let parser = pulldown_cmark::Parser::new_ext(&input, options).into_offset_iter();
        let mut events: Events<'_> = Box::new(RuleFilter::new(parser, &input, self.rules, self.settings));
        for extension in &self.extensions {
            events = extension.remap(events, &ctxt);
        }

        let mut output = String::with_capacity(input.len() + input.len() / 2);
        html::push_html(&mut output, events);
        Ok(output)
    }
}

fn parse_rules<I>(names: I) -> Result<Vec<Rule>>
    where I: IntoIterator, I::Item: AsRef<str>
{
    names.into_iter().map(|name| Rule::parse(name.as_ref())).collect()
}

/// How a construct whose rule is disabled is emitted instead.
enum Fallback {
    /// As its source text, inline.
    Text,
    /// As a paragraph holding its source text.
    Paragraph,
}

/// Reduces constructs of disabled core rules to their source text and
/// applies the HTML and line break settings.
struct RuleFilter<'a, I> {
    inner: I,
    source: &'a str,
    rules: Rules,
    settings: Settings,
    pending: VecDeque<Event<'a>>,
}

impl<'a, I> RuleFilter<'a, I>
    where I: Iterator<Item = (Event<'a>, Range<usize>)>
{
    fn new(inner: I, source: &'a str, rules: Rules, settings: Settings) -> Self {
        RuleFilter { inner, source, rules, settings, pending: VecDeque::new() }
    }

    fn fallback(&self, tag: &Tag<'_>) -> Option<Fallback> {
        let (rule, fallback) = match tag {
            Tag::Emphasis | Tag::Strong => (Rule::Emphasis, Fallback::Text),
            Tag::Link { .. } => (Rule::Link, Fallback::Text),
            Tag::Image { .. } => (Rule::Image, Fallback::Text),
            Tag::Heading { .. } => (Rule::Heading, Fallback::Paragraph),
            Tag::BlockQuote => (Rule::Blockquote, Fallback::Paragraph),
            Tag::CodeBlock(CodeBlockKind::Indented) => (Rule::Code, Fallback::Paragraph),
            Tag::CodeBlock(CodeBlockKind::Fenced(_)) => (Rule::Fence, Fallback::Paragraph),
            Tag::List(_) => (Rule::List, Fallback::Paragraph),
            Tag::HtmlBlock if !self.settings.html => return Some(Fallback::Paragraph),
            _ => return None,
        };

        (!self.rules.contains(rule)).then_some(fallback)
    }

    /// Consumes events up to and including the end of the current tag.
    fn skip_tag(&mut self) {
        let mut depth = 1usize;
        while depth > 0 {
            match self.inner.next() {
                Some((Event::Start(_), _)) => depth += 1,
                Some((Event::End(_), _)) => depth -= 1,
                Some(_) => continue,
                None => break,
            }
        }
    }

    fn text(&self, range: Range<usize>) -> Event<'a> {
        Event::Text(self.source[range].into())
    }

    fn paragraph(&mut self, range: Range<usize>) -> Event<'a> {
        let source: &'a str = self.source;
        self.pending.push_back(Event::Text(source[range].trim().into()));
        self.pending.push_back(Event::End(TagEnd::Paragraph));
        Event::Start(Tag::Paragraph)
    }
}

impl<'a, I> Iterator for RuleFilter<'a, I>
    where I: Iterator<Item = (Event<'a>, Range<usize>)>
{
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(event) = self.pending.pop_front() {
            return Some(event);
        }

        let (event, range) = self.inner.next()?;
        let event = match event {
            Event::Start(tag) => match self.fallback(&tag) {
                Some(Fallback::Text) => {
                    self.skip_tag();
                    self.text(range)
                }
                Some(Fallback::Paragraph) => {
                    self.skip_tag();
                    self.paragraph(range)
                }
                None => Event::Start(tag),
            },
            Event::Code(_) if !self.rules.contains(Rule::Backticks) => self.text(range),
            Event::Rule if !self.rules.contains(Rule::Hr) => self.paragraph(range),
            Event::InlineHtml(html) | Event::Html(html) if !self.settings.html => Event::Text(html),
            Event::SoftBreak if self.settings.breaks => Event::HardBreak,
            event => event,
        };

        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(parser: &Parser, input: &str) -> String {
        parser.render(input).unwrap()
    }

    #[test]
    fn default_preset_renders_extended_syntax() {
        let parser = Parser::new(Preset::Default);
        assert_eq!(render(&parser, "# Hi\n\n*a* ~~b~~"), "<h1>Hi</h1>\n<p><em>a</em> <del>b</del></p>\n");
        assert!(render(&parser, "| a |\n| - |\n| b |").contains("<table>"));
    }

    #[test]
    fn zero_preset_keeps_source_text() {
        let parser = Parser::new(Preset::Zero);
        assert_eq!(render(&parser, "*a* `b`"), "<p>*a* `b`</p>\n");
        assert_eq!(render(&parser, "# Title"), "<p># Title</p>\n");
        assert_eq!(render(&parser, "plain"), "<p>plain</p>\n");
    }

    #[test]
    fn enabling_and_disabling_rules() {
        let mut parser = Parser::new(Preset::Zero);
        parser.enable(["emphasis", "heading"]).unwrap();
        assert!(parser.is_enabled(Rule::Emphasis));
        assert_eq!(render(&parser, "# *Title*"), "<h1><em>Title</em></h1>\n");

        parser.disable(["heading"]).unwrap();
        assert_eq!(render(&parser, "# Title"), "<p># Title</p>\n");

        let mut parser = Parser::new(Preset::CommonMark);
        parser.disable(["list"]).unwrap();
        assert_eq!(render(&parser, "- a\n- b\n"), "<p>- a\n- b</p>\n");
    }

    #[test]
    fn unknown_rules_change_nothing() {
        let mut parser = Parser::new(Preset::Zero);
        let error = parser.enable(["emphasis", "linkify"]).unwrap_err();
        assert!(error.to_string().contains("linkify"));
        assert_eq!(parser.rules(), Rules::NONE);
    }

    #[test]
    fn html_setting_controls_raw_html() {
        let escaped = Parser::new(Preset::Default);
        assert_eq!(render(&escaped, "a <b>c</b>"), "<p>a &lt;b&gt;c&lt;/b&gt;</p>\n");
        assert_eq!(render(&escaped, "<div>x</div>"), "<p>&lt;div&gt;x&lt;/div&gt;</p>\n");

        let raw = Parser::with_options(Preset::Default, &ParserOptions {
            html: Some(true),
            ..Default::default()
        });

        assert_eq!(render(&raw, "a <b>c</b>"), "<p>a <b>c</b></p>\n");
        assert_eq!(render(&Parser::new(Preset::CommonMark), "a <b>c</b>"), "<p>a <b>c</b></p>\n");
    }

    #[test]
    fn breaks_and_typographer() {
        let options = ParserOptions { breaks: Some(true), typographer: Some(true), ..Default::default() };
        let parser = Parser::with_options(Preset::Default, &options);
        assert_eq!(render(&parser, "a\nb"), "<p>a<br />\nb</p>\n");
        assert_eq!(render(&parser, "wait..."), "<p>wait…</p>\n");

        assert_eq!(render(&Parser::new(Preset::Default), "a\nb"), "<p>a\nb</p>\n");
    }

    #[test]
    fn options_resolve_in_order() {
        let options = Options::from_toml(r#"
            preset = "zero"
            enable = ["emphasis", "link"]
            disable = ["link"]
            parser = { html = true }
        "#).unwrap();

        let parser = Parser::from_options(&options).unwrap();
        assert_eq!(parser.rules().iter().collect::<Vec<_>>(), vec![Rule::Emphasis]);
        assert!(parser.settings().html);
        assert_eq!(parser.preset(), Preset::Zero);
    }
}
