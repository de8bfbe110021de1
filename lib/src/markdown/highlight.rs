use pulldown_cmark::{Event, Tag, CodeBlockKind, TagEnd};
use syntect::html::{ClassedHTMLGenerator, ClassStyle};
use syntect::parsing::{SyntaxSet, SyntaxReference};
use syntect::util::LinesWithEndings;
use pulldown_cmark_escape::escape_html;
use once_cell::sync::Lazy;

use crate::markdown::{Context, Events, Extension};

static SYNTAX_SET: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

static DEFAULT_SYNTAX: Lazy<&'static SyntaxReference>
    = Lazy::new(|| SYNTAX_SET.find_syntax_plain_text());

/// Highlights fenced code blocks with CSS classes.
///
/// The fence's info string up to the first `,` or space names the language.
/// Blocks in unknown languages, or that fail to highlight, are emitted as
/// plain text.
#[derive(Debug, Default, Clone)]
pub struct SyntaxHighlight {
    /// Emit a column of line numbers beside the code.
    pub line_numbers: bool,
}

impl SyntaxHighlight {
    pub fn with_line_numbers() -> Self {
        SyntaxHighlight { line_numbers: true }
    }

    /// Loads the syntax definitions in the background.
    #[inline]
    pub fn warm_up() {
        rayon::spawn(|| { Lazy::force(&DEFAULT_SYNTAX); });
    }
}

/// A fenced block being highlighted.
struct Block {
    lang: String,
    generator: ClassedHTMLGenerator<'static>,
    source: String,
    failed: bool,
}

impl Block {
    fn push(&mut self, text: &str) {
        self.source.push_str(text);
        if self.failed {
            return;
        }

        for line in LinesWithEndings::from(text) {
            if let Err(e) = self.generator.parse_html_for_line_which_includes_newline(line) {
                tracing::warn!(lang = %self.lang, error = %e, "highlighting failed; emitting plain code");
                self.failed = true;
                return;
            }
        }
    }

    #[allow(unused_must_use)]
    fn finish(self, line_numbers: bool) -> String {
        let lines = line_numbers.then(|| LinesWithEndings::from(&self.source).count());
        let code = match self.failed {
            false => self.generator.finalize(),
            true => {
                let mut code = String::with_capacity(self.source.len());
                escape_html(&mut code, &self.source);
                code
            }
        };

        code_block(&self.lang, lines, code)
    }
}

struct Highlighter<'a> {
    block: Option<Block>,
    line_numbers: bool,
    inner: Events<'a>,
}

impl Extension for SyntaxHighlight {
    fn remap<'a>(&'a self, events: Events<'a>, _: &'a Context<'_>) -> Events<'a> {
        Box::new(Highlighter {
            block: None,
            line_numbers: self.line_numbers,
            inner: events,
        })
    }
}

fn html_generator(syntax: &'static SyntaxReference) -> ClassedHTMLGenerator<'static> {
    ClassedHTMLGenerator::new_with_class_style(syntax, &*SYNTAX_SET, ClassStyle::Spaced)
}

fn language(info: &str) -> &str {
    info.split([',', ' ']).next().unwrap_or_default()
}

#[allow(unused_must_use)]
fn code_block(lang: &str, lines: Option<usize>, code: String) -> String {
    use std::fmt::Write;

    let mut html = String::new();
    if let Some(lines) = lines {
        write!(&mut html, "<div class=\"code\" style=\"display: flex;\">");
        write!(&mut html, "<pre class=\"line-nums\">");
        for i in 1..=lines {
            if i < lines { writeln!(&mut html, "{}", i); }
            else { write!(&mut html, "{}", i); }
        }

        write!(&mut html, "</pre>");
    }

    html.push_str("<pre class=\"code\" data-lang=\"");
    escape_html(&mut html, lang);
    write!(&mut html, "\"><code>{code}</code></pre>");
    if lines.is_some() {
        write!(&mut html, "</div>");
    }

    html.push('\n');
    html
}

impl<'a> Iterator for Highlighter<'a> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(label))) => {
                    let lang = language(&label);
                    let syntax = SYNTAX_SET.find_syntax_by_token(lang)
                        .unwrap_or_else(|| &*DEFAULT_SYNTAX);

                    self.block = Some(Block {
                        lang: lang.to_string(),
                        generator: html_generator(syntax),
                        source: String::new(),
                        failed: false,
                    });
                }
                Event::Text(text) if self.block.is_some() => {
                    if let Some(block) = self.block.as_mut() {
                        block.push(&text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if self.block.is_some() => {
                    let html = self.block.take()?.finish(self.line_numbers);
                    return Some(Event::Html(html.into()));
                },
                event => return Some(event),
            }
        }
    }
}
