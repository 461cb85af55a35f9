use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use std::path::PathBuf;

/// Transpile and type-check TypeScript files the way a bundler loader would.
#[derive(Parser, Debug)]
#[command(name = "tsloader", version)]
pub struct Cli {
    /// Verbosity:
    /// -v -> Debug
    /// -vv -> Trace
    /// -q -> Warn
    /// -qq -> Error
    /// -qqq -> Off.
    /// Default (without -v or -q) -> Info
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ContextArg {
    /// Directory diagnostics are reported relative to.
    #[arg(long, default_value = ".")]
    pub context: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Files to compile.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    #[command(flatten)]
    pub context: ContextArg,

    /// Report every diagnostic as a warning.
    #[arg(long)]
    pub warn_only: bool,

    /// Name of the configuration file marking a root.
    #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE_NAME)]
    pub config_file_name: String,

    /// Compile everything with the default options, ignoring configuration files.
    #[arg(long)]
    pub no_config_lookup: bool,

    /// Number of files compiled in parallel. Defaults to the number of CPUs.
    #[arg(long, short = 'j')]
    pub jobs: Option<usize>,

    /// Language service program, started once per configuration root.
    #[arg(long)]
    pub service: String,

    /// Extra argument for the language service. Repeatable.
    #[arg(long = "service-arg", allow_hyphen_values = true)]
    pub service_args: Vec<String>,

    /// Print the transpiled code of each file.
    #[arg(long)]
    pub emit: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Compile files and report their diagnostics.
    Build(BuildArgs),
    /// Show which configuration root owns a file and its resolved options.
    Config {
        file: PathBuf,

        #[command(flatten)]
        context: ContextArg,

        #[arg(long, default_value = crate::config::DEFAULT_CONFIG_FILE_NAME)]
        config_file_name: String,
    },
}
