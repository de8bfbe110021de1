#![doc = svgbobdoc::transform!(
//! Markdown field rendering for static site pipelines.
//!
//! # Overview
//!
//! A build is an in-memory collection of [`Files`](files::Files): records of
//! named fields keyed by path. This crate renders the Markdown held in chosen
//! fields of chosen files to HTML, in place, and renames the rendered files:
//!
//! ```svgbob
//!  +---------+   pattern   +----------+  selectors  +--------+
//!  |  Files  +------------>| matching +------------>| fields |
//!  +---------+             |  files   |             +---+----+
//!                          +----+-----+                 |
//!                               |                       | render
//!                               v                       v
//!                        +-------------+        +--------------+
//!                        | a/b.md ->   |        | Parser       |
//!                        |   a/b.html  |        |  preset      |
//!                        +-------------+        |  rules       |
//!                                               |  extensions  |
//!                                               +--------------+
//! ```
//!
//!   * A [`Filter`](rewrite::Filter) glob picks the files to touch.
//!   * [`Selector`](selector::Selector)s such as `contents` or
//!     `excerpt.*.subfield` pick the fields, possibly nested, within each.
//!   * A [`Parser`](markdown::Parser), configured from a
//!     [`Preset`](markdown::Preset), literal options, rules and
//!     [`Extension`](markdown::Extension)s, renders each field.
//!   * The [`Markdown`](markdown::Markdown) plugin ties these together;
//!     [`Rewriter`](rewrite::Rewriter) is the render-agnostic core.
//!
//! ```rust
//! use marksmith::dict;
//! use marksmith::files::{Files, FileRecord};
//! use marksmith::markdown::{Markdown, Options};
//! use marksmith::value::{Dict, Value};
//!
//! let options = Options::from_toml(r#"
//!     [plugin]
//!     fields = ["contents", "excerpt"]
//! "#)?;
//!
//! let post = FileRecord::from(dict! {
//!     "contents" => "# Title\n\nBody *text*.",
//!     "excerpt" => "Short *text*.",
//! });
//!
//! let mut files: Files = [("posts/one.md", post)].into_iter().collect();
//! Markdown::with_options(&options)?.run(&mut files, &Dict::new())?;
//!
//! let post = files.get("posts/one.html").unwrap();
//! assert_eq!(post["excerpt"], Value::from("<p>Short <em>text</em>.</p>\n"));
//! # Ok::<(), marksmith::error::Error>(())
//! ```
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod value;
pub mod files;
pub mod selector;
pub mod rewrite;
pub mod markdown;
