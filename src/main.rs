use anyhow::Context;
use clap::Parser;
use devguide::{
    Config, ENV_API_KEY, ENV_BASE_URL, ENV_EXCLUDE, ENV_LANGUAGE, ENV_MAX_TOKENS, ENV_MODEL,
    ENV_OUTPUT_DIR, ENV_TARGET_DIR, Pipeline,
};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "devguide",
    version,
    author,
    about = "Generate a developer guide for a project with an LLM",
    long_about = "Generate a developer guide for a project with an LLM.\n\n\
    This tool walks a project directory, summarizes every text file, every directory \
    and the project as a whole, aggregates the summaries into structured findings and \
    asks the model to write a markdown guide. Each run writes three artifacts sharing \
    one timestamp: initial-summaries_<stamp>.txt, findings/<stamp>/findings.json and \
    guidebook_<stamp>.md.\n\n\
    Every option can also be set through its environment variable.\n\n\
    USAGE EXAMPLES:\n  \
      # Analyze a project, writing artifacts to the current directory\n  \
      GUIDE_TARGET_PROJECT_DIRECTORY=./my-project ANTHROPIC_API_KEY=... devguide\n\n  \
      # Same, with flags and a separate output directory\n  \
      devguide --dir ./my-project --out ./guides\n\n  \
      # List the files that would be summarized\n  \
      devguide --dir ./my-project --dry-run"
)]
struct Cli {
    /// Project directory to analyze
    #[arg(short, long, env = ENV_TARGET_DIR, value_name = "PATH")]
    dir: Option<PathBuf>,

    /// Directory the artifacts are written to [default: .]
    #[arg(short, long, env = ENV_OUTPUT_DIR, value_name = "PATH")]
    out: Option<PathBuf>,

    /// Completion API credential
    #[arg(long, env = ENV_API_KEY, hide_env_values = true, value_name = "KEY")]
    api_key: Option<String>,

    /// Completion API base URL
    #[arg(long, env = ENV_BASE_URL, value_name = "URL")]
    base_url: Option<String>,

    /// Model identifier
    #[arg(short, long, env = ENV_MODEL)]
    model: Option<String>,

    /// Maximum tokens per response
    #[arg(long, env = ENV_MAX_TOKENS)]
    max_tokens: Option<String>,

    /// Language the summaries and the guide are written in
    #[arg(short, long, env = ENV_LANGUAGE)]
    language: Option<String>,

    /// Comma-separated names excluded in addition to the defaults
    #[arg(short, long, env = ENV_EXCLUDE, value_name = "NAMES")]
    exclude: Option<String>,

    /// Honor .gitignore files found in the project
    #[arg(long)]
    gitignore: bool,

    /// Skip the per-directory summary pass
    #[arg(long)]
    no_directory_summaries: bool,

    /// Skip files larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_file_bytes: Option<u64>,

    /// Dry run (no completion requests, no files written)
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Value of the setting normally read from `key`.
    ///
    /// clap has already folded the environment into each field, so this is
    /// the only source the configuration needs.
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            ENV_TARGET_DIR => self.dir.as_ref().map(|p| p.display().to_string()),
            ENV_OUTPUT_DIR => self.out.as_ref().map(|p| p.display().to_string()),
            ENV_API_KEY => self.api_key.clone(),
            ENV_BASE_URL => self.base_url.clone(),
            ENV_MODEL => self.model.clone(),
            ENV_MAX_TOKENS => self.max_tokens.clone(),
            ENV_LANGUAGE => self.language.clone(),
            ENV_EXCLUDE => self.exclude.clone(),
            _ => None,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut config =
        Config::from_lookup(|key| cli.lookup(key)).context("Failed to build configuration")?;
    config.respect_gitignore = cli.gitignore;
    config.summarize_directories = !cli.no_directory_summaries;
    config.max_file_bytes = cli.max_file_bytes;
    config.dry_run = cli.dry_run;

    let report = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Pipeline execution failed")?;

    report.print_summary();

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("devguide=info"),
        1 => EnvFilter::new("devguide=debug"),
        _ => EnvFilter::new("devguide=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_thread_ids(false))
        .init();

    Ok(())
}
