//! ird CLI
//!
//! Command-line interface for generating and inspecting PS3 IRD files.

mod cli_types;
mod commands;
mod error;

use std::fs;
use std::io::Write;
use std::sync::Mutex;

use clap::Parser;
use log::LevelFilter;

use cli_types::{Cli, Commands};
use error::CliError;

// -- Custom logger --

struct CliLogger {
    level: LevelFilter,
    logfile: Option<Mutex<fs::File>>,
}

impl log::Log for CliLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();

        if record.level() <= log::Level::Warn {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }

        if let Some(ref file) = self.logfile {
            let stripped = strip_ansi_escapes::strip(&msg);
            let text = String::from_utf8_lossy(&stripped);
            let mut guard = file.lock().unwrap();
            let _ = writeln!(guard, "{}", text);
        }
    }

    fn flush(&self) {
        if let Some(ref file) = self.logfile {
            let _ = std::io::Write::flush(&mut *file.lock().unwrap());
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.quiet {
        LevelFilter::Warn
    } else if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let logfile = cli.logfile.map(|p| {
        let file = fs::File::create(&p).unwrap_or_else(|e| {
            eprintln!("Error: could not create logfile {}: {}", p.display(), e);
            std::process::exit(1);
        });
        Mutex::new(file)
    });
    let logger = Box::new(CliLogger { level, logfile });
    log::set_boxed_logger(logger).expect("Failed to set logger");
    log::set_max_level(level);

    let result = match cli.command {
        Commands::Create {
            iso,
            key,
            key_file,
            getkey_log,
            region,
            layerbreak,
            reproducible,
            version,
            exact_ird,
            output,
        } => commands::create::run_create(
            iso,
            key,
            key_file,
            getkey_log,
            region,
            layerbreak,
            reproducible,
            version,
            exact_ird,
            output,
        ),
        Commands::Info { path, json, all } => commands::info::run_info(path, json, all),
    };

    if let Err(err) = result {
        report_error(&err);
        std::process::exit(1);
    }
}

fn report_error(err: &CliError) {
    log::error!("{err}");
}
