use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(subcommand_value_name = "SUBCOMMAND")]
#[command(subcommand_help_heading = "Subcommands")]
pub struct Cli {
    #[command(subcommand)]
    pub subcommand: Sub,
}

#[derive(Subcommand)]
pub enum Sub {
    /// List keyboard-capable input devices.
    List,
    /// Grab the configured keyboards and start remapping.
    Grab {
        /// Path to the JSON configuration file.
        config: PathBuf,
    },
}
