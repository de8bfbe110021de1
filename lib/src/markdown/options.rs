use std::fmt;
use std::path::Path;

use pulldown_cmark::Options as CmarkOptions;
use serde::Deserialize;

use crate::error::Result;
use crate::rewrite::MARKDOWN_PATTERN;
use crate::value::{Format, Toml, Json};

macro_rules! rules {
    ($($(#[$attr:meta])* $name:literal => $V:ident),* $(,)?) => {
        /// A syntax rule of the parser that can be switched on or off.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Rule {
            $($(#[$attr])* $V),*
        }

        impl Rule {
            pub const ALL: &'static [Rule] = &[$(Rule::$V),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Rule::$V => $name),*
                }
            }

            pub fn from_name(name: &str) -> Option<Rule> {
                match name {
                    $($name => Some(Rule::$V),)*
                    _ => None
                }
            }
        }
    }
}

rules! {
    /// `*em*`, `_em_`, `**strong**`, `__strong__`.
    "emphasis" => Emphasis,
    /// `~~del~~`.
    "strikethrough" => Strikethrough,
    /// Inline, reference and autolinks.
    "link" => Link,
    "image" => Image,
    /// Inline code spans.
    "backticks" => Backticks,
    /// ATX and setext headings.
    "heading" => Heading,
    "blockquote" => Blockquote,
    /// Indented code blocks.
    "code" => Code,
    /// Fenced code blocks.
    "fence" => Fence,
    "list" => List,
    /// Thematic breaks.
    "hr" => Hr,
    "table" => Table,
    "footnote" => Footnote,
    "tasklist" => Tasklist,
}

impl Rule {
    /// The parser extension implementing `self`, if it isn't core syntax.
    pub fn cmark_option(self) -> Option<CmarkOptions> {
        match self {
            Rule::Strikethrough => Some(CmarkOptions::ENABLE_STRIKETHROUGH),
            Rule::Table => Some(CmarkOptions::ENABLE_TABLES),
            Rule::Footnote => Some(CmarkOptions::ENABLE_FOOTNOTES),
            Rule::Tasklist => Some(CmarkOptions::ENABLE_TASKLISTS),
            _ => None,
        }
    }

    pub fn is_core(self) -> bool {
        self.cmark_option().is_none()
    }

    /// Like [`Rule::from_name()`], but fails on unknown names.
    pub fn parse(name: &str) -> Result<Rule> {
        match Rule::from_name(name) {
            Some(rule) => Ok(rule),
            None => err! {
                "unknown markdown rule",
                "rule" => name,
                "known rules" => Rule::ALL.iter().map(|r| r.name()).collect::<Vec<_>>().join(", "),
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A set of [`Rule`]s.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Rules(u16);

impl Rules {
    pub const NONE: Rules = Rules(0);

    pub fn all() -> Rules {
        Rule::ALL.iter().copied().collect()
    }

    pub fn core() -> Rules {
        Rule::ALL.iter().copied().filter(|r| r.is_core()).collect()
    }

    pub fn contains(self, rule: Rule) -> bool {
        self.0 & (1 << rule as u16) != 0
    }

    pub fn insert(&mut self, rule: Rule) {
        self.0 |= 1 << rule as u16;
    }

    pub fn remove(&mut self, rule: Rule) {
        self.0 &= !(1 << rule as u16);
    }

    pub fn without(mut self, rule: Rule) -> Rules {
        self.remove(rule);
        self
    }

    pub fn iter(self) -> impl Iterator<Item = Rule> {
        Rule::ALL.iter().copied().filter(move |r| self.contains(*r))
    }

    /// The parser options enabling every non-core rule in `self`.
    pub fn cmark_options(self) -> CmarkOptions {
        self.iter()
            .filter_map(|rule| rule.cmark_option())
            .fold(CmarkOptions::empty(), |a, b| a | b)
    }
}

impl FromIterator<Rule> for Rules {
    fn from_iter<T: IntoIterator<Item = Rule>>(iter: T) -> Self {
        let mut rules = Rules::NONE;
        iter.into_iter().for_each(|rule| rules.insert(rule));
        rules
    }
}

/// A named starting configuration for the parser.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Every rule but footnotes and task lists; raw HTML is escaped.
    #[default]
    Default,
    /// Only CommonMark syntax; raw HTML passes through.
    CommonMark,
    /// Nothing but paragraphs and text.
    Zero,
}

impl Preset {
    pub const ALL: &'static [Preset] = &[Preset::Default, Preset::CommonMark, Preset::Zero];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Default => "default",
            Preset::CommonMark => "commonmark",
            Preset::Zero => "zero",
        }
    }

    /// Looks up a preset by name.
    ///
    /// ```rust
    /// use marksmith::markdown::Preset;
    ///
    /// assert_eq!(Preset::parse("zero").unwrap(), Preset::Zero);
    /// assert!(Preset::parse("fancy").is_err());
    /// ```
    pub fn parse(name: &str) -> Result<Preset> {
        match Preset::ALL.iter().find(|p| p.name() == name) {
            Some(preset) => Ok(*preset),
            None => err! {
                "unknown markdown preset",
                "preset" => name,
                "known presets" => "default, commonmark, zero",
            }
        }
    }

    pub fn rules(self) -> Rules {
        match self {
            Preset::Default => Rules::all().without(Rule::Footnote).without(Rule::Tasklist),
            Preset::CommonMark => Rules::core(),
            Preset::Zero => Rules::NONE,
        }
    }

    pub fn settings(self) -> Settings {
        match self {
            Preset::CommonMark => Settings { html: true, ..Settings::default() },
            Preset::Default | Preset::Zero => Settings::default(),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fully resolved parser switches.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    /// Pass raw HTML through instead of escaping it.
    pub html: bool,
    /// Render soft line breaks as `<br />`.
    pub breaks: bool,
    /// Smart quotes, dashes and ellipses.
    pub typographer: bool,
    /// `# Heading {#id .class}` attributes.
    pub heading_attributes: bool,
}

impl Settings {
    pub fn cmark_options(&self) -> CmarkOptions {
        let mut options = CmarkOptions::empty();
        options.set(CmarkOptions::ENABLE_SMART_PUNCTUATION, self.typographer);
        options.set(CmarkOptions::ENABLE_HEADING_ATTRIBUTES, self.heading_attributes);
        options
    }
}

/// Literal parser switches. Each one that's set overrides the preset's.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserOptions {
    pub html: Option<bool>,
    pub breaks: Option<bool>,
    pub typographer: Option<bool>,
    pub heading_attributes: Option<bool>,
}

impl ParserOptions {
    /// Overrides `base` field by field with the options that are set.
    ///
    /// ```rust
    /// use marksmith::markdown::{ParserOptions, Preset};
    ///
    /// let options = ParserOptions { typographer: Some(true), ..Default::default() };
    /// let settings = options.merge(Preset::CommonMark.settings());
    /// assert!(settings.typographer && settings.html);
    /// ```
    pub fn merge(&self, base: Settings) -> Settings {
        Settings {
            html: self.html.unwrap_or(base.html),
            breaks: self.breaks.unwrap_or(base.breaks),
            typographer: self.typographer.unwrap_or(base.typographer),
            heading_attributes: self.heading_attributes.unwrap_or(base.heading_attributes),
        }
    }
}

fn default_fields() -> Vec<String> {
    vec![crate::files::CONTENTS.to_string()]
}

fn default_extension() -> String {
    "html".into()
}

/// Which files and fields the plugin rewrites.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginOptions {
    /// Glob selecting files. Defaults to Markdown files.
    pub pattern: Option<String>,
    /// Field selectors, rendered in order.
    pub fields: Vec<String>,
    /// Extension given to rewritten files. Empty to keep paths as they are.
    pub extension: String,
    /// Render disjoint files on the rayon pool.
    pub parallel: bool,
}

impl PluginOptions {
    pub fn pattern(&self) -> &str {
        self.pattern.as_deref().unwrap_or(MARKDOWN_PATTERN)
    }
}

impl Default for PluginOptions {
    fn default() -> Self {
        PluginOptions {
            pattern: None,
            fields: default_fields(),
            extension: default_extension(),
            parallel: false,
        }
    }
}

/// Everything needed to build a [`Markdown`](super::Markdown) plugin.
///
/// ```rust
/// use marksmith::markdown::{Options, Preset};
///
/// let options = Options::from_toml(r#"
///     preset = "zero"
///     enable = ["emphasis"]
///
///     [parser]
///     typographer = true
///
///     [plugin]
///     pattern = "**/*.html"
///     fields = ["contents", "excerpt"]
///     extension = "htm"
/// "#).unwrap();
///
/// assert_eq!(options.preset, Preset::Zero);
/// assert_eq!(options.parser.typographer, Some(true));
/// assert_eq!(options.plugin.fields, ["contents", "excerpt"]);
/// ```
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    pub preset: Preset,
    /// Rules enabled on top of the preset's.
    pub enable: Vec<String>,
    /// Rules disabled after `enable` is applied.
    pub disable: Vec<String>,
    pub parser: ParserOptions,
    pub plugin: PluginOptions,
}

impl Options {
    pub fn from_toml(string: &str) -> Result<Options> {
        Ok(Toml::from_str(string)?)
    }

    /// Reads options from a TOML file, or JSON if the path ends in `.json`.
    pub fn read(path: &Path) -> Result<Options> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Json::read(path),
            _ => Toml::read(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_names_round_trip() {
        for rule in Rule::ALL {
            assert_eq!(Rule::from_name(rule.name()), Some(*rule));
        }

        assert!(Rule::parse("linkify").is_err());
    }

    #[test]
    fn rule_sets() {
        let mut rules = Rules::NONE;
        rules.insert(Rule::Emphasis);
        rules.insert(Rule::Table);
        assert!(rules.contains(Rule::Emphasis) && !rules.contains(Rule::Link));
        assert_eq!(rules.cmark_options(), CmarkOptions::ENABLE_TABLES);

        rules.remove(Rule::Table);
        assert_eq!(rules.iter().collect::<Vec<_>>(), vec![Rule::Emphasis]);
        assert_eq!(Rules::all().iter().count(), Rule::ALL.len());
    }

    #[test]
    fn preset_rules() {
        assert!(!Preset::Default.rules().contains(Rule::Footnote));
        assert!(Preset::Default.rules().contains(Rule::Table));
        assert!(!Preset::CommonMark.rules().contains(Rule::Strikethrough));
        assert!(Preset::CommonMark.rules().contains(Rule::Fence));
        assert_eq!(Preset::Zero.rules(), Rules::NONE);
        assert!(Preset::CommonMark.settings().html);
        assert!(!Preset::Default.settings().html);
    }

    #[test]
    fn literal_options_override_presets_field_by_field() {
        let choices = [None, Some(false), Some(true)];
        for preset in Preset::ALL {
            let base = preset.settings();
            for html in choices {
                for typographer in choices {
                    let options = ParserOptions { html, typographer, ..Default::default() };
                    let merged = options.merge(base);
                    assert_eq!(merged.html, html.unwrap_or(base.html));
                    assert_eq!(merged.typographer, typographer.unwrap_or(base.typographer));
                    assert_eq!(merged.breaks, base.breaks);
                    assert_eq!(merged.heading_attributes, base.heading_attributes);
                }
            }
        }
    }

    #[test]
    fn options_defaults() {
        let options = Options::from_toml("").unwrap();
        assert_eq!(options.preset, Preset::Default);
        assert_eq!(options.plugin.pattern(), MARKDOWN_PATTERN);
        assert_eq!(options.plugin.fields, ["contents"]);
        assert_eq!(options.plugin.extension, "html");
        assert!(!options.plugin.parallel);
    }

    #[test]
    fn options_reject_unknowns() {
        assert!(Options::from_toml("preset = 'fancy'").is_err());
        assert!(Options::from_toml("[parser]\nlinkify = true").is_err());
    }
}
