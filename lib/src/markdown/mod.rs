//! Markdown to HTML rendering.
//!
//! A [`Parser`] is built from a [`Preset`], adjusted with literal
//! [`ParserOptions`], individual [`Rule`]s and [`Extension`]s, and renders
//! text. The [`Markdown`] plugin pairs a parser with a
//! [`Rewriter`](crate::rewrite::Rewriter) to render fields of a file
//! collection in place.

mod options;
mod parser;
mod extension;
mod abbr;
mod vars;
mod heading;
mod highlight;
mod plugin;

pub use options::*;
pub use parser::Parser;
pub use extension::{Extension, Context, Events};
pub use abbr::Abbreviations;
pub use vars::Variables;
pub use heading::{AutoHeading, HeadingAnchor};
pub use highlight::SyntaxHighlight;
pub use plugin::{Markdown, EnvFn};
