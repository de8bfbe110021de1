use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{GlobBuilder, GlobMatcher};
use rayon::prelude::*;

use crate::error::{Result, Chainable};
use crate::files::{FileRecord, Files};
use crate::selector::{self, Selector};

/// Matches Markdown sources when no pattern is configured.
pub const MARKDOWN_PATTERN: &str = "**/*.{md,markdown}";

/// A glob over paths relative to the collection root.
///
/// `*` and `?` never match `/`; `**` spans directories.
#[derive(Debug, Clone)]
pub struct Filter {
    pattern: Arc<str>,
    matcher: GlobMatcher,
}

impl Filter {
    pub fn new(pattern: &str) -> Result<Self> {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .chain_with(|| error! {
                "invalid file pattern",
                "pattern" => pattern,
            })?;

        Ok(Filter { pattern: pattern.into(), matcher: glob.compile_matcher() })
    }

    pub fn markdown() -> Result<Self> {
        Filter::new(MARKDOWN_PATTERN)
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn is_match<P: AsRef<Path>>(&self, path: P) -> bool {
        self.matcher.is_match(path)
    }
}

/// What a rewrite pass did.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Report {
    /// Files matched by the filter.
    pub files: usize,
    /// Field values replaced with rendered output.
    pub fields: usize,
    /// `(from, to)` for every renamed file.
    pub renamed: Vec<(PathBuf, PathBuf)>,
}

/// Rewrites selected fields of matching files in place.
///
/// For every file whose path matches the filter, each selector is resolved
/// against the file's current fields, in order, and every textual value it
/// reaches is replaced by the render function's output. Selectors that reach
/// nothing, and values that aren't text, are skipped. Once every file is
/// processed, matching files are renamed to carry the output extension, if
/// one is set.
#[derive(Debug, Clone)]
pub struct Rewriter {
    filter: Filter,
    selectors: Vec<Selector>,
    extension: Option<Arc<str>>,
}

impl Rewriter {
    pub fn new(filter: Filter, selectors: Vec<Selector>) -> Self {
        Rewriter { filter, selectors, extension: None }
    }

    /// Parses each of `fields` as a [`Selector`], failing on the first
    /// invalid one.
    pub fn parse_selectors<S: AsRef<str>>(fields: &[S]) -> Result<Vec<Selector>> {
        let selectors = fields.iter()
            .map(|field| Selector::parse(field.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(selectors)
    }

    /// Renames rewritten files to use `extension`. A leading `.` is ignored.
    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = Some(extension.trim_start_matches('.').into());
        self
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn selectors(&self) -> &[Selector] {
        &self.selectors
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.filter.is_match(path)
    }

    /// The path a matching file is moved to, if renaming is enabled.
    ///
    /// ```rust
    /// use std::path::Path;
    /// use marksmith::rewrite::{Filter, Rewriter};
    ///
    /// let rewriter = Rewriter::new(Filter::markdown()?, vec![]).with_extension("html");
    /// assert_eq!(rewriter.output_path(Path::new("a/b.md")).unwrap(), Path::new("a/b.html"));
    /// assert_eq!(rewriter.output_path(Path::new("README")).unwrap(), Path::new("README.html"));
    /// # Ok::<(), marksmith::error::Error>(())
    /// ```
    pub fn output_path(&self, path: &Path) -> Option<PathBuf> {
        self.extension().map(|ext| path.with_extension(ext))
    }

    /// Rewrites the selected fields of a single record, returning how many
    /// values were replaced. Doesn't consult the filter.
    pub fn apply<F>(&self, path: &Path, record: &mut FileRecord, mut render: F) -> Result<usize>
        where F: FnMut(&str) -> Result<String>
    {
        let mut rendered = 0;
        for selector in &self.selectors {
            let fields = selector.resolve(&**record);
            if fields.is_empty() {
                tracing::trace!(path = %path.display(), %selector, "selector matched nothing");
                continue;
            }

            for field in fields {
                let Some(value) = selector::get_mut(&mut **record, &field) else {
                    continue;
                };

                let Some(text) = value.as_text() else {
                    tracing::trace!(path = %path.display(), kind = value.kind(), "skipping non-text field");
                    continue;
                };

                let output = render(text).chain_with(|| error! {
                    "failed to render field",
                    "file" => path.display(),
                    "field" => selector::display_path(&field),
                })?;

                value.replace_text(output);
                rendered += 1;
            }
        }

        tracing::debug!(path = %path.display(), fields = rendered, "rewrote file");
        Ok(rendered)
    }

    /// Rewrites every matching file with `render`.
    pub fn run<F>(&self, files: &mut Files, mut render: F) -> Result<Report>
        where F: FnMut(&str) -> Result<String>
    {
        let mut report = Report::default();
        for (path, record) in files.iter_mut().filter(|(path, _)| self.matches(path)) {
            report.fields += self.apply(path, record, &mut render)?;
            report.files += 1;
        }

        self.finish(files, report)
    }

    /// Like [`Rewriter::run()`], but builds a render function for each file
    /// from the file's path and fields before any of them are rewritten.
    pub fn run_with<G, F>(&self, files: &mut Files, mut prepare: G) -> Result<Report>
        where G: FnMut(&Path, &FileRecord) -> F,
              F: FnMut(&str) -> Result<String>
    {
        let mut report = Report::default();
        for (path, record) in files.iter_mut().filter(|(path, _)| self.matches(path)) {
            let render = prepare(path, record);
            report.fields += self.apply(path, record, render)?;
            report.files += 1;
        }

        self.finish(files, report)
    }

    /// Like [`Rewriter::run_with()`], but processes files on the rayon pool.
    /// Each file is still rewritten by a single thread, selector by selector.
    pub fn par_run_with<G, F>(&self, files: &mut Files, prepare: G) -> Result<Report>
        where G: Fn(&Path, &FileRecord) -> F + Sync,
              F: FnMut(&str) -> Result<String>
    {
        let (matched, fields) = files.par_iter_mut()
            .filter(|(path, _)| self.matches(path))
            .map(|(path, record)| {
                let render = prepare(path, record);
                self.apply(path, record, render).map(|fields| (1, fields))
            })
            .try_reduce(|| (0, 0), |a, b| Ok((a.0 + b.0, a.1 + b.1)))?;

        self.finish(files, Report { files: matched, fields, renamed: vec![] })
    }

    fn finish(&self, files: &mut Files, mut report: Report) -> Result<Report> {
        if self.extension.is_some() {
            let renames: Vec<_> = files.paths()
                .filter(|path| self.matches(path))
                .filter_map(|path| Some((path.to_path_buf(), self.output_path(path)?)))
                .filter(|(from, to)| from != to)
                .collect();

            for (from, to) in renames {
                files.rename(&from, to.clone());
                report.renamed.push((from, to));
            }
        }

        tracing::debug!(
            pattern = self.filter.as_str(),
            files = report.files,
            fields = report.fields,
            renamed = report.renamed.len(),
            "rewrite complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dict;
    use crate::value::Value;

    fn rewriter(pattern: &str, fields: &[&str]) -> Rewriter {
        let selectors = Rewriter::parse_selectors(fields).unwrap();
        Rewriter::new(Filter::new(pattern).unwrap(), selectors)
    }

    fn shout(text: &str) -> Result<String> {
        Ok(text.to_uppercase())
    }

    #[test]
    fn unmatched_files_are_untouched() {
        let mut files: Files = [
            ("a.md", FileRecord::with_contents("a")),
            ("b.txt", FileRecord::with_contents("b")),
        ].into_iter().collect();

        let before = files.get("b.txt").cloned();
        let report = rewriter(MARKDOWN_PATTERN, &["contents"]).run(&mut files, shout).unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(files.get("b.txt").cloned(), before);
        assert_eq!(files.get("a.md").unwrap().contents(), Some(&Value::from("A")));
    }

    #[test]
    fn only_selected_fields_change() {
        let mut record = FileRecord::from(dict! {
            "contents" => "body",
            "title" => "title",
            "count" => 3u8,
        });

        let fields = rewriter("*", &["title", "count", "missing"])
            .apply(Path::new("x"), &mut record, shout)
            .unwrap();

        assert_eq!(fields, 1);
        assert_eq!(record["title"], Value::from("TITLE"));
        assert_eq!(record["contents"], Value::from("body"));
        assert_eq!(record["count"], Value::from(3u8));
        assert_eq!(record.keys().map(|k| &**k).collect::<Vec<_>>(), vec!["contents", "count", "title"]);
    }

    #[test]
    fn wildcard_rewrites_each_element() {
        let mut record = FileRecord::from(dict! {
            "excerpt" => vec![
                Value::from(dict!["subfield" => "a"]),
                Value::from(dict!["subfield" => "b"]),
            ],
        });

        rewriter("*", &["excerpt.*.subfield"])
            .apply(Path::new("x"), &mut record, |t| Ok(format!("<p>{t}</p>")))
            .unwrap();

        let expected = Value::from(vec![
            Value::from(dict!["subfield" => "<p>a</p>"]),
            Value::from(dict!["subfield" => "<p>b</p>"]),
        ]);

        assert_eq!(record["excerpt"], expected);
        assert_eq!(record.len(), 1);
    }

    #[test]
    fn missing_fields_are_tolerated() {
        let mut files: Files = [("index.md", FileRecord::from(dict!["title" => "t"]))]
            .into_iter()
            .collect();

        let before = files.clone();
        let report = rewriter("*.md", &["excerpt"]).run(&mut files, shout).unwrap();
        assert_eq!(report.fields, 0);
        assert_eq!(files, before);
    }

    #[test]
    fn selectors_apply_in_order() {
        let mut record = FileRecord::from(dict!["title" => "hi"]);
        rewriter("*", &["title", "title"])
            .apply(Path::new("x"), &mut record, |t| Ok(format!("{t}!")))
            .unwrap();

        assert_eq!(record["title"], Value::from("hi!!"));
    }

    #[test]
    fn renames_after_rewriting() {
        let mut files: Files = [
            ("a/b.md", FileRecord::with_contents(b"*x*".to_vec())),
            ("a/c.css", FileRecord::with_contents("body {}")),
        ].into_iter().collect();

        let report = rewriter(MARKDOWN_PATTERN, &["contents"])
            .with_extension(".html")
            .run(&mut files, shout)
            .unwrap();

        assert_eq!(report.renamed, vec![(PathBuf::from("a/b.md"), PathBuf::from("a/b.html"))]);
        assert!(!files.contains("a/b.md"));
        let contents = files.get("a/b.html").unwrap().contents().unwrap();
        assert_eq!(contents.as_bytes(), Some(&b"*X*"[..]));
        assert!(files.contains("a/c.css"));
    }

    #[test]
    fn render_failure_aborts_without_renaming() {
        let mut files: Files = [
            ("a.md", FileRecord::with_contents("ok")),
            ("b.md", FileRecord::with_contents("boom")),
        ].into_iter().collect();

        let result = rewriter(MARKDOWN_PATTERN, &["contents"])
            .with_extension("html")
            .run(&mut files, |t| match t {
                "boom" => err!("render exploded"),
                t => Ok(t.to_string()),
            });

        let error = result.unwrap_err();
        assert_eq!(error.message(), "failed to render field");
        assert!(error.to_string().contains("render exploded"));
        assert!(files.contains("a.md") && files.contains("b.md"));
    }

    #[test]
    fn parallel_run_matches_sequential() {
        let files: Files = (0..32)
            .map(|i| (format!("post-{i}.md"), FileRecord::from(dict! {
                "contents" => format!("body {i}"),
                "title" => format!("title {i}"),
            })))
            .collect();

        let rewriter = rewriter(MARKDOWN_PATTERN, &["contents", "title"]).with_extension("html");
        let (mut sequential, mut parallel) = (files.clone(), files);
        let a = rewriter.run_with(&mut sequential, |path, _| {
            let stem = path.to_path_buf();
            move |t: &str| -> Result<String> { Ok(format!("{}:{t}", stem.display())) }
        }).unwrap();

        let b = rewriter.par_run_with(&mut parallel, |path, _| {
            let stem = path.to_path_buf();
            move |t: &str| -> Result<String> { Ok(format!("{}:{t}", stem.display())) }
        }).unwrap();

        assert_eq!(sequential, parallel);
        assert_eq!((a.files, a.fields), (32, 64));
        assert_eq!(a, b);
        assert_eq!(parallel.get("post-7.html").unwrap()["title"], Value::from("post-7.md:title 7"));
    }

    #[test]
    fn single_star_stays_in_one_directory() {
        let top = Filter::new("*.md").unwrap();
        assert!(top.is_match("index.md"));
        assert!(!top.is_match("posts/one.md"));

        let deep = Filter::markdown().unwrap();
        assert!(deep.is_match("index.md"));
        assert!(deep.is_match("posts/2024/one.markdown"));
        assert!(!deep.is_match("posts/one.txt"));
    }

    #[test]
    fn invalid_pattern_and_selector_fail_early() {
        assert!(Filter::new("a/[").is_err());
        let error = Rewriter::parse_selectors(&["contents", "excerpt..x"]).unwrap_err();
        assert!(error.message().contains("excerpt..x"));
    }
}
