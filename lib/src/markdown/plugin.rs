use std::path::Path;
use std::sync::Arc;

use derive_more::Debug;

use crate::error::Result;
use crate::files::{FileRecord, Files};
use crate::markdown::{Extension, Options, Parser, Preset};
use crate::rewrite::{Filter, Report, Rewriter};
use crate::value::Dict;

/// Computes a file's rendering environment from its record and the build's
/// global metadata.
pub type EnvFn = dyn Fn(&FileRecord, &Dict) -> Dict + Send + Sync;

/// Renders Markdown fields of matching files to HTML.
///
/// ```rust
/// use marksmith::files::{Files, FileRecord};
/// use marksmith::markdown::Markdown;
/// use marksmith::value::{Dict, Value};
///
/// let mut files: Files = [("a/b.md", FileRecord::with_contents("*hi*"))].into_iter().collect();
/// Markdown::new()?.run(&mut files, &Dict::new())?;
///
/// let contents = files.get("a/b.html").unwrap().contents().unwrap();
/// assert_eq!(contents, &Value::from("<p><em>hi</em></p>\n"));
/// # Ok::<(), marksmith::error::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Markdown {
    parser: Parser,
    rewriter: Rewriter,
    #[debug(ignore)]
    env: Option<Arc<EnvFn>>,
    parallel: bool,
}

impl Markdown {
    /// The default preset and plugin options.
    pub fn new() -> Result<Self> {
        Markdown::with_options(&Options::default())
    }

    /// Default plugin options with the preset named `name`.
    pub fn preset(name: &str) -> Result<Self> {
        let preset = Preset::parse(name)?;
        Markdown::with_options(&Options { preset, ..Options::default() })
    }

    /// Validates `options`, failing on unknown rules, invalid patterns and
    /// invalid field selectors.
    pub fn with_options(options: &Options) -> Result<Self> {
        let parser = Parser::from_options(options)?;
        let plugin = &options.plugin;
        let selectors = Rewriter::parse_selectors(&plugin.fields)?;
        let mut rewriter = Rewriter::new(Filter::new(plugin.pattern())?, selectors);
        if !plugin.extension.is_empty() {
            rewriter = rewriter.with_extension(&plugin.extension);
        }

        Ok(Markdown { parser, rewriter, env: None, parallel: plugin.parallel })
    }

    pub fn enable<I>(mut self, names: I) -> Result<Self>
        where I: IntoIterator, I::Item: AsRef<str>
    {
        self.parser.enable(names)?;
        Ok(self)
    }

    pub fn disable<I>(mut self, names: I) -> Result<Self>
        where I: IntoIterator, I::Item: AsRef<str>
    {
        self.parser.disable(names)?;
        Ok(self)
    }

    pub fn use_extension<E: Extension + 'static>(mut self, extension: E) -> Self {
        self.parser.use_extension(extension);
        self
    }

    /// Sets the function computing each file's rendering environment.
    pub fn env<F>(mut self, f: F) -> Self
        where F: Fn(&FileRecord, &Dict) -> Dict + Send + Sync + 'static
    {
        self.env = Some(Arc::new(f));
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    /// Renders the configured fields of every matching file in `files`.
    ///
    /// The environment of each file is computed once, from the file as it
    /// was before any of its fields were rendered. Fails on the first field
    /// that can't be rendered, leaving every path in place.
    pub fn run(&self, files: &mut Files, metadata: &Dict) -> Result<Report> {
        let prepare = |_: &Path, record: &FileRecord| {
            let env = self.env.as_ref()
                .map(|f| f(record, metadata))
                .unwrap_or_default();

            move |text: &str| self.parser.render_with(text, &env)
        };

        let report = match self.parallel {
            true => self.rewriter.par_run_with(files, prepare)?,
            false => self.rewriter.run_with(files, prepare)?,
        };

        tracing::info!(
            preset = %self.parser.preset(),
            files = report.files,
            fields = report.fields,
            "rendered markdown"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::dict;
    use crate::markdown::{Abbreviations, Variables};
    use crate::value::Value;

    fn files<const N: usize>(records: [(&str, FileRecord); N]) -> Files {
        records.into_iter().collect()
    }

    fn text(files: &Files, path: &str, field: &str) -> String {
        files.get(path).unwrap()[field].as_text().unwrap().to_string()
    }

    #[test]
    fn converts_markdown_files_by_default() {
        let mut files = files([
            ("index.md", FileRecord::with_contents(b"# Hello\n\nThis is *markdown*.".to_vec())),
            ("style.css", FileRecord::with_contents("p {}")),
        ]);

        let report = Markdown::new().unwrap().run(&mut files, &Dict::new()).unwrap();
        assert_eq!(report.renamed, vec![(PathBuf::from("index.md"), PathBuf::from("index.html"))]);
        assert_eq!(text(&files, "index.html", "contents"), "<h1>Hello</h1>\n<p>This is <em>markdown</em>.</p>\n");
        assert!(files.get("index.html").unwrap().contents().unwrap().as_bytes().is_some());
        assert_eq!(text(&files, "style.css", "contents"), "p {}");
    }

    #[test]
    fn presets_and_literal_options() {
        let input = "A <span>b</span> -- c...";
        let mut escaped = files([("a.md", FileRecord::with_contents(input))]);
        Markdown::preset("default").unwrap().run(&mut escaped, &Dict::new()).unwrap();
        assert_eq!(text(&escaped, "a.html", "contents"), "<p>A &lt;span&gt;b&lt;/span&gt; -- c...</p>\n");

        let options = Options::from_toml("[parser]\nhtml = true\ntypographer = true").unwrap();
        let mut raw = files([("a.md", FileRecord::with_contents(input))]);
        Markdown::with_options(&options).unwrap().run(&mut raw, &Dict::new()).unwrap();
        assert_eq!(text(&raw, "a.html", "contents"), "<p>A <span>b</span> – c…</p>\n");

        assert!(Markdown::preset("fancy").is_err());
    }

    #[test]
    fn parser_is_exposed_for_mutation() {
        let input = "*a* **b** `c`";
        let expected = "<p><em>a</em> <strong>b</strong> `c`</p>\n";

        let mut direct = Markdown::preset("zero").unwrap();
        direct.parser_mut().enable(["emphasis"]).unwrap();
        let mut first = files([("p.md", FileRecord::with_contents(input))]);
        direct.run(&mut first, &Dict::new()).unwrap();
        assert_eq!(text(&first, "p.html", "contents"), expected);

        let chained = Markdown::preset("zero").unwrap().enable(["emphasis"]).unwrap();
        let mut second = files([("p.md", FileRecord::with_contents(input))]);
        chained.run(&mut second, &Dict::new()).unwrap();
        assert_eq!(first, second);

        assert!(Markdown::new().unwrap().disable(["nope"]).is_err());
    }

    #[test]
    fn extensions_render() {
        let input = "*[HTML]: Hyper Text Markup Language\n\nThe HTML spec.";
        let markdown = Markdown::preset("default").unwrap().use_extension(Abbreviations);
        let mut files = files([("abbr.md", FileRecord::with_contents(input))]);
        markdown.run(&mut files, &Dict::new()).unwrap();
        assert_eq!(
            text(&files, "abbr.html", "contents"),
            "<p>The <abbr title=\"Hyper Text Markup Language\">HTML</abbr> spec.</p>\n"
        );
    }

    #[test]
    fn environment_is_computed_per_file() {
        let markdown = Markdown::new().unwrap()
            .use_extension(Variables)
            .env(|page, metadata| dict! {
                "title" => page.get("title").cloned(),
                "siteName" => metadata.get("siteName").cloned(),
            });

        let mut files = files([
            ("one.md", FileRecord::from(dict!["title" => "One", "contents" => "# @title\n\n@siteName"])),
            ("two.md", FileRecord::from(dict!["title" => "Two", "contents" => "# @title"])),
        ]);

        let metadata = dict!["siteName" => "The test build"];
        markdown.run(&mut files, &metadata).unwrap();
        assert_eq!(text(&files, "one.html", "contents"), "<h1>One</h1>\n<p>The test build</p>\n");
        assert_eq!(text(&files, "two.html", "contents"), "<h1>Two</h1>\n");
        assert_eq!(text(&files, "two.html", "title"), "Two");
    }

    #[test]
    fn plugin_options_select_files_and_fields() {
        let options = Options::from_toml(r#"
            [plugin]
            pattern = "**/*.html"
            fields = ["contents", "excerpt"]
            extension = "htm"
        "#).unwrap();

        let mut files = files([
            ("index.html", FileRecord::from(dict!["contents" => "*a*", "excerpt" => "**b**"])),
            ("notes.md", FileRecord::with_contents("*c*")),
        ]);

        Markdown::with_options(&options).unwrap().run(&mut files, &Dict::new()).unwrap();
        assert!(!files.contains("index.html"));
        assert_eq!(text(&files, "index.htm", "contents"), "<p><em>a</em></p>\n");
        assert_eq!(text(&files, "index.htm", "excerpt"), "<p><strong>b</strong></p>\n");
        assert_eq!(text(&files, "notes.md", "contents"), "*c*");
    }

    #[test]
    fn subfield_selectors() {
        let record = || FileRecord::from(dict! {
            "contents" => "main",
            "excerpt" => vec![
                Value::from(dict!["subfield" => "*one*"]),
                Value::from(dict!["subfield" => "*two*"]),
            ],
            "main" => dict!["submain" => dict!["subfield" => "*three*"]],
        });

        let render = |fields: &str| {
            let options = Options::from_toml(&format!("[plugin]\nfields = [{fields}]")).unwrap();
            let mut files = files([("index.md", record())]);
            Markdown::with_options(&options).unwrap().run(&mut files, &Dict::new()).unwrap();
            files.remove("index.html").unwrap()
        };

        let one_level = render("'excerpt.*.subfield'");
        let excerpt = one_level["excerpt"].as_slice().unwrap();
        assert_eq!(excerpt[1].as_dict().unwrap()["subfield"], Value::from("<p><em>two</em></p>\n"));
        assert_eq!(one_level["main"], record()["main"]);
        assert_eq!(one_level["contents"], Value::from("main"));

        let deep = render("'**.subfield'");
        let main = deep["main"].as_dict().unwrap()["submain"].as_dict().unwrap();
        assert_eq!(main["subfield"], Value::from("<p><em>three</em></p>\n"));
        let excerpt = deep["excerpt"].as_slice().unwrap();
        assert_eq!(excerpt[0].as_dict().unwrap()["subfield"], Value::from("<p><em>one</em></p>\n"));
    }

    #[test]
    fn invalid_configuration_fails_before_rendering() {
        let options = Options::from_toml("[plugin]\nfields = ['excerpt..x']").unwrap();
        assert!(Markdown::with_options(&options).is_err());

        let options = Options::from_toml("[plugin]\npattern = 'a/['").unwrap();
        assert!(Markdown::with_options(&options).is_err());

        let options = Options::from_toml("enable = ['linkify']").unwrap();
        assert!(Markdown::with_options(&options).is_err());
    }

    #[test]
    fn empty_extension_keeps_paths() {
        let options = Options::from_toml("[plugin]\nextension = ''").unwrap();
        let mut files = files([("a.md", FileRecord::with_contents("x"))]);
        let report = Markdown::with_options(&options).unwrap().run(&mut files, &Dict::new()).unwrap();
        assert!(report.renamed.is_empty());
        assert_eq!(text(&files, "a.md", "contents"), "<p>x</p>\n");
    }

    #[test]
    fn parallel_rendering_matches_sequential() {
        let build = || (0..24)
            .map(|i| (format!("posts/{i}.md"), FileRecord::with_contents(format!("# Post {i}\n\n_{i}_"))))
            .collect::<Files>();

        let (mut sequential, mut parallel) = (build(), build());
        Markdown::new().unwrap().run(&mut sequential, &Dict::new()).unwrap();
        Markdown::new().unwrap().parallel(true).run(&mut parallel, &Dict::new()).unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(text(&parallel, "posts/3.html", "contents"), "<h1>Post 3</h1>\n<p><em>3</em></p>\n");
    }
}
