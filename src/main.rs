use chatgpt_md_export::{DateStyle, ExportConfig, Zone};
use clap::Parser;
use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Convert ChatGPT conversations to Obsidian-friendly Markdown.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the input JSON file containing ChatGPT conversations.
    #[arg(short, long, value_name = "PATH")]
    input_file: PathBuf,

    /// Directory to write one Markdown file per conversation into.
    /// Created if missing.
    #[arg(short, long, value_name = "PATH")]
    output_directory: PathBuf,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/chatgpt-md-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Show creation times in UTC instead of the local time zone.
    #[arg(long, conflicts_with = "local")]
    utc: bool,

    /// Show creation times in the local time zone, even if the config file
    /// says `utc = true`.
    #[arg(long)]
    local: bool,

    /// Write dates as plain text instead of [[YYYY-MM-DD]] daily-note links.
    #[arg(long, conflicts_with = "link_dates")]
    plain_dates: bool,

    /// Write dates as [[YYYY-MM-DD]] links, even if the config file says
    /// `plain_dates = true`.
    #[arg(long)]
    link_dates: bool,

    /// Number of worker threads. Defaults to the available parallelism.
    #[arg(short, long, value_name = "N")]
    jobs: Option<usize>,

    /// More log output (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report warnings and errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    utc: Option<bool>,
    plain_dates: Option<bool>,
    jobs: Option<usize>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("chatgpt-md-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

/// An on/off flag pair wins over the config file, which wins over off.
fn switch(on: bool, off: bool, from_file: Option<bool>) -> bool {
    match (on, off) {
        (true, _) => true,
        (_, true) => false,
        _ => from_file.unwrap_or(false),
    }
}

fn resolve_config(cli: &Cli, file_cfg: &FileConfig) -> ExportConfig {
    let zone = if switch(cli.utc, cli.local, file_cfg.utc) {
        Zone::Utc
    } else {
        Zone::Local
    };
    let date_style = if switch(cli.plain_dates, cli.link_dates, file_cfg.plain_dates) {
        DateStyle::Plain
    } else {
        DateStyle::Links
    };
    let workers = cli.jobs.or(file_cfg.jobs).unwrap_or_else(|| {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(8)
    });

    ExportConfig {
        input: cli.input_file.clone(),
        target_dir: cli.output_directory.clone(),
        zone,
        date_style,
        workers,
        quiet: cli.quiet,
    }
}

fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let level = match (cli.quiet, cli.verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatgpt_md_export={level}")));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Flags win over the config file, which wins over defaults
    let config = resolve_config(&cli, &file_cfg);

    // 3. Run the Business Logic
    #[cfg(feature = "sequential")]
    let stats = chatgpt_md_export::sequential::execute(&config)?;

    #[cfg(not(feature = "sequential"))]
    let stats = chatgpt_md_export::parallel::execute(&config)?;

    info!(
        "Done. {} written, {} skipped without messages.",
        stats.written, stats.skipped
    );
    Ok(())
}
