use std::path::PathBuf;

use audit_core::EnrichmentPolicy;
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "audit_app",
    version,
    about = "Run WebPageTest audits and follow them to a report"
)]
pub struct Cli {
    /// Session id for recent tests and AI preferences; a persisted one is used by default.
    #[arg(long, global = true)]
    pub session: Option<String>,

    #[arg(long, global = true, default_value = ".audit")]
    pub state_dir: PathBuf,

    /// Log file; `./audit.log` when omitted.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Debug-level logs, echoed to the terminal.
    #[arg(long, global = true, default_value_t = false)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit a URL and follow the new test.
    Run(RunArgs),
    /// Follow an existing test id.
    Open(OpenArgs),
    /// List the tests recorded for this session.
    Recent,
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Ask for AI suggestions once metrics are in.
    #[arg(long, default_value_t = false)]
    pub ai: bool,

    #[arg(long, value_enum, default_value_t = PolicyArg::Stream)]
    pub policy: PolicyArg,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    pub url: String,

    /// Use the mobile 4G agent instead of desktop cable.
    #[arg(long, default_value_t = false)]
    pub mobile: bool,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OpenArgs {
    pub test_id: String,

    #[command(flatten)]
    pub watch: WatchArgs,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum PolicyArg {
    Stream,
    Block,
    BlockHistorical,
}

impl From<PolicyArg> for EnrichmentPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Stream => EnrichmentPolicy::RevealThenStream,
            PolicyArg::Block => EnrichmentPolicy::BlockUntilReady,
            PolicyArg::BlockHistorical => EnrichmentPolicy::BlockHistorical,
        }
    }
}
