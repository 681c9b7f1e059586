// Command-line argument parsing and command enum
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "h4",
    version,
    about = "HDF4 CLI: inspect HDF4 / HDF-EOS files",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show file summary: magic, type id, DD-chain statistics
    Info {
        /// Path to the .hdf file
        file: String,
    },
    /// List the raw data descriptors from the DD chain
    Tags {
        /// Path to the .hdf file
        file: String,
        /// Only show tags with this HDF4 tag number
        #[arg(long, value_name = "NUMBER")]
        tag: Option<u16>,
    },
}
