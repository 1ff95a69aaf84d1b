//! CLI type definitions: command enums and argument structs.

use std::path::PathBuf;

use clap::{ArgGroup, Parser, Subcommand, ValueEnum};

use ird_format::Bd25Region;

#[derive(Parser)]
#[command(name = "ird")]
#[command(about = "Generate, read, and inspect PS3 IRD (ISO Rebuild Data) files", long_about = None)]
pub(crate) struct Cli {
    /// Only show warnings and errors (suppress normal output)
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Enable verbose/debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Write log output to a file (ANSI codes stripped)
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Region code carried in the last byte of a BD-25 DiscID.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub(crate) enum Bd25RegionArg {
    A,
    E,
    J,
    K,
    U,
}

impl From<Bd25RegionArg> for Bd25Region {
    fn from(value: Bd25RegionArg) -> Self {
        match value {
            Bd25RegionArg::A => Bd25Region::A,
            Bd25RegionArg::E => Bd25Region::E,
            Bd25RegionArg::J => Bd25Region::J,
            Bd25RegionArg::K => Bd25Region::K,
            Bd25RegionArg::U => Bd25Region::U,
        }
    }
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Generate an IRD from an ISO image
    #[command(group(
        ArgGroup::new("key_source")
            .args(["key", "key_file", "getkey_log"])
            .required(true)
    ))]
    Create {
        /// Path to the ISO image
        iso: PathBuf,

        /// 32 hex character DiscKey
        #[arg(long)]
        key: Option<String>,

        /// Path to a file containing a 32 hex character DiscKey
        #[arg(long)]
        key_file: Option<PathBuf>,

        /// Path to a GetKey-tool text log (supplies DiscKey, DiscID, and PIC)
        #[arg(long)]
        getkey_log: Option<PathBuf>,

        /// BD-25 region code, required alongside --key/--key-file for
        /// single-layer discs (ignored for --getkey-log, which supplies
        /// its own DiscID)
        #[arg(long, value_enum)]
        region: Option<Bd25RegionArg>,

        /// Explicit layerbreak byte offset (required for hybrid BD-Video
        /// BD-50 discs)
        #[arg(long)]
        layerbreak: Option<u64>,

        /// Build a reproducible ("redump-style") IRD: UID = CRC-32(ISO)
        #[arg(short, long)]
        reproducible: bool,

        /// IRD on-disk layout version
        #[arg(long, value_parser = clap::value_parser!(u8).range(6..=9), default_value_t = 9)]
        version: u8,

        /// Overwrite PIC byte 114 with the 3k3y-style exact-IRD marker
        #[arg(long)]
        exact_ird: bool,

        /// Output path for the generated .ird file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Inspect an existing IRD file
    Info {
        /// Path to the .ird file
        path: PathBuf,

        /// Emit machine-readable JSON instead of a formatted summary
        #[arg(long)]
        json: bool,

        /// Include region hashes, file hashes, PIC, and keys in the output
        #[arg(long)]
        all: bool,
    },
}
