use std::process::ExitCode;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use marksmith::error::Result;
use marksmith::files::Files;
use marksmith::markdown::Preset;

use crate::config::Config;

mod config;

pub const CONFIG_FILE: &str = "marksmith.toml";

mod flags {
    use std::path::PathBuf;

    xflags::xflags! {
        /// Renders the Markdown files of a directory to HTML.
        cmd anvil {
            /// Directory holding the source files.
            required source: PathBuf
            /// Directory to write the build to.
            required destination: PathBuf
            /// Options file. Defaults to `marksmith.toml` in the source directory.
            optional -c, --config path: PathBuf
            /// Markdown preset, overriding the options file.
            optional -p, --preset name: String
            /// Log debug output.
            optional -v, --verbose
        }
    }
}

fn run(flags: &flags::Anvil) -> Result<()> {
    let start = Instant::now();
    let mut config = Config::discover(&flags.source, flags.config.as_deref())?;
    if let Some(preset) = &flags.preset {
        config.markdown.preset = Preset::parse(preset)?;
    }

    let plugin = config.plugin()?;
    let mut files = Files::load(&flags.source)?;
    if let Some(path) = &config.path {
        if let Ok(relative) = path.strip_prefix(&flags.source) {
            files.remove(relative);
        }
    }

    let report = plugin.run(&mut files, &config.metadata)?;
    files.write(&flags.destination)?;

    tracing::info!(
        files = files.len(),
        rendered = report.files,
        renamed = report.renamed.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "build complete"
    );

    Ok(())
}

fn main() -> ExitCode {
    let flags = flags::Anvil::from_env_or_exit();
    let filter = match flags.verbose {
        true => EnvFilter::new("debug"),
        false => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(&flags) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
