use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum ToolStateArg {
    Draft,
    Testing,
    Promoted,
    Retired,
}

impl From<ToolStateArg> for twinraven_types::ToolState {
    fn from(value: ToolStateArg) -> Self {
        match value {
            ToolStateArg::Draft => twinraven_types::ToolState::Draft,
            ToolStateArg::Testing => twinraven_types::ToolState::Testing,
            ToolStateArg::Promoted => twinraven_types::ToolState::Promoted,
            ToolStateArg::Retired => twinraven_types::ToolState::Retired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum RetirementReasonArg {
    Manual,
    Unused,
    Drift,
    FailureSpike,
    Superseded,
}

impl From<RetirementReasonArg> for twinraven_types::RetirementReason {
    fn from(value: RetirementReasonArg) -> Self {
        match value {
            RetirementReasonArg::Manual => twinraven_types::RetirementReason::Manual,
            RetirementReasonArg::Unused => twinraven_types::RetirementReason::Unused,
            RetirementReasonArg::Drift => twinraven_types::RetirementReason::Drift,
            RetirementReasonArg::FailureSpike => twinraven_types::RetirementReason::FailureSpike,
            RetirementReasonArg::Superseded => twinraven_types::RetirementReason::Superseded,
        }
    }
}

#[derive(Parser)]
#[command(name = "twinraven")]
#[command(about = "Mine, synthesize, validate, and register composite tools from recorded agent telemetry", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Workspace directory holding the event/candidate/registry stores.
    /// Defaults to `$TWINRAVEN_PATH` or a platform data directory.
    #[arg(long, global = true)]
    pub workspace: Option<String>,

    #[arg(long, default_value = "plain", global = true)]
    pub format: OutputFormat,

    #[arg(long, default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Mine recorded events for repeated tool-call chains.
    Mine {
        #[arg(long, default_value = "0.1")]
        min_support: f64,
        #[arg(long, default_value = "0.5")]
        min_confidence: f64,
        #[arg(long, default_value = "8")]
        max_chain_length: usize,
    },

    /// List candidate chains discovered since a given RFC 3339 timestamp.
    Candidates {
        #[arg(long)]
        since: String,
    },

    /// List registered tools, optionally filtered by lifecycle state.
    Tools {
        #[arg(long)]
        state: Option<ToolStateArg>,
    },

    /// Show a single registered tool's version history.
    ToolHistory {
        slug: String,
    },

    /// Retire a registered tool.
    Retire {
        slug: String,
        #[arg(long, default_value = "manual")]
        reason: RetirementReasonArg,
    },

    /// Run the staleness, failure-spike, and drift scans over registered tools.
    Scan {
        #[command(subcommand)]
        kind: ScanCommand,
    },

    /// Export recorded events to a file.
    Export {
        #[command(subcommand)]
        kind: ExportCommand,
    },

    /// Initialize a workspace directory (creates stores and the tools directory).
    Init,
}

#[derive(Subcommand)]
pub enum ScanCommand {
    /// Tools with no recorded usage past their configured staleness window.
    Staleness,
    /// Tools whose recent failure rate exceeds their historical rate.
    FailureSpike,
    /// Tools whose current chain no longer matches the pattern they were registered from.
    Drift {
        #[arg(long)]
        since: String,
    },
}

#[derive(Subcommand)]
pub enum ExportCommand {
    /// Line-delimited JSON, one event per line.
    Ndjson { path: String },
    /// Batched columnar JSON.
    Columnar {
        path: String,
        #[arg(long)]
        batch_rows: Option<usize>,
    },
    /// Trace spans derived from the event chain.
    Spans { path: String },
}
