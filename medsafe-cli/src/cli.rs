//! Argument definitions for the `medsafe` terminal client.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "medsafe",
    version,
    about = "AI-assisted prescription analysis and medical chat"
)]
pub struct Cli {
    /// Log verbosely to stderr.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Structured analysis of a prescription.
    Analyze(PrescriptionInput),

    /// Search-grounded interaction check for a comma-separated drug list.
    Interactions {
        /// e.g. "Aspirin, Warfarin"
        drugs: String,
    },

    /// Run the Granite and BioBERT endpoints on a prescription.
    Secondary(PrescriptionInput),

    /// Chat with the medical assistant. Type `exit` or send EOF to leave.
    Chat {
        /// Disable search grounding for replies.
        #[arg(long)]
        no_search: bool,
    },
}

#[derive(Args)]
pub struct PrescriptionInput {
    /// Prescription text.
    #[arg(conflicts_with_all = ["sample", "file"])]
    pub text: Option<String>,

    /// Use the built-in sample prescription.
    #[arg(long)]
    pub sample: bool,

    /// Read the prescription from a file.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}
