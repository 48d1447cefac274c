use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "darkroom")]
pub(crate) struct Cli {
    #[arg(long, default_value = "")]
    pub(crate) data_dir: String,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Manage the API key pool.
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Run one generation pass against the key pool.
    Generate(GenerateArgs),
}

#[derive(Subcommand)]
pub(crate) enum KeysCommand {
    /// Add one or more keys to the pool.
    Add {
        secrets: Vec<String>,
        /// Probe each new key immediately instead of validating lazily.
        #[arg(long)]
        check: bool,
    },
    /// Remove a key from the pool.
    Remove { secret: String },
    /// Make a key the one tried first.
    Prefer { secret: String },
    /// Show the pool with redacted secrets.
    List,
    /// Probe every non-invalid key and record the result.
    Check,
}

#[derive(Args)]
pub(crate) struct GenerateArgs {
    #[arg(long, value_enum)]
    pub(crate) mode: ModeArg,
    /// Source image to edit.
    #[arg(long)]
    pub(crate) image: PathBuf,
    /// Free-text instruction for the edit.
    #[arg(long, default_value = "")]
    pub(crate) prompt: String,
    /// One-click workflow; overrides --prompt.
    #[arg(long, value_enum)]
    pub(crate) workflow: Option<WorkflowArg>,
    /// Mask image (creative mode); white areas are protected.
    #[arg(long)]
    pub(crate) mask: Option<PathBuf>,
    /// Reference image (creative mode).
    #[arg(long)]
    pub(crate) reference: Option<PathBuf>,
    /// New background image (composite mode).
    #[arg(long)]
    pub(crate) background: Option<PathBuf>,
    /// JSON file with mode settings; defaults apply when omitted.
    #[arg(long)]
    pub(crate) settings: Option<PathBuf>,
    #[arg(long, default_value = darkroom_core::gemini::DEFAULT_MODEL)]
    pub(crate) model: String,
    /// Skip the remote service and echo the source image back.
    #[arg(long)]
    pub(crate) offline: bool,
    #[arg(short, long, default_value = "output.png")]
    pub(crate) output: PathBuf,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum ModeArg {
    Portrait,
    Restore,
    Creative,
    Composite,
}

#[derive(Clone, Copy, ValueEnum)]
pub(crate) enum WorkflowArg {
    InstantRemaster,
    StudioSwap,
    FullBody,
}

impl From<WorkflowArg> for darkroom_prompt::Workflow {
    fn from(value: WorkflowArg) -> Self {
        match value {
            WorkflowArg::InstantRemaster => Self::InstantRemaster,
            WorkflowArg::StudioSwap => Self::StudioSwap,
            WorkflowArg::FullBody => Self::FullBody,
        }
    }
}
