use std::path::{Path, PathBuf};

use serde::Deserialize;

use marksmith::error::Result;
use marksmith::files::{FileRecord, CONTENTS};
use marksmith::markdown::{self, Markdown, Options};
use marksmith::value::{Dict, Format, Json, Toml};

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Parser and plugin options.
    pub markdown: Options,
    /// Extensions to register, in order.
    pub extensions: Vec<String>,
    /// Global metadata, visible to `@name` variables.
    pub metadata: Dict,
    /// Where the config was read from, if anywhere.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Reads `explicit` if given, else the config file in `source` if there
    /// is one.
    pub fn discover(source: &Path, explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => source.join(crate::CONFIG_FILE),
        };

        if explicit.is_none() && !path.is_file() {
            tracing::debug!(path = %path.display(), "no config file; using defaults");
            return Ok(Config::default());
        }

        let mut config: Config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Json::read(path.as_path())?,
            _ => Toml::read(path.as_path())?,
        };

        tracing::debug!(path = %path.display(), "read config");
        config.path = Some(path);
        Ok(config)
    }

    /// Builds the plugin: parser and rewriter from `markdown`, then each
    /// extension, with every file's fields layered over the global metadata
    /// as its environment.
    pub fn plugin(&self) -> Result<Markdown> {
        let mut plugin = Markdown::with_options(&self.markdown)?
            .env(|page: &FileRecord, metadata: &Dict| {
                let mut env = metadata.clone();
                let fields = page.iter().filter(|(key, _)| &***key != CONTENTS);
                env.extend(fields.map(|(k, v)| (k.clone(), v.clone())));
                env
            });

        for name in &self.extensions {
            plugin = match name.as_str() {
                "abbreviations" => plugin.use_extension(markdown::Abbreviations),
                "variables" => plugin.use_extension(markdown::Variables),
                "heading-ids" => plugin.use_extension(markdown::AutoHeading),
                "heading-anchors" => plugin.use_extension(markdown::HeadingAnchor),
                "highlight" => {
                    markdown::SyntaxHighlight::warm_up();
                    plugin.use_extension(markdown::SyntaxHighlight::default())
                }
                _ => return marksmith::err! {
                    "unknown markdown extension",
                    "extension" => name,
                    "known extensions" => "abbreviations, variables, heading-ids, heading-anchors, highlight",
                },
            };
        }

        Ok(plugin)
    }
}
