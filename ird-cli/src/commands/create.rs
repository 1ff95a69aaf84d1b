use std::fs::File;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use ird_core::StatusUpdate;
use ird_format::engine::{EngineOptions, KeySource, generate_ird};
use ird_format::keys::DiscId;

use crate::cli_types::Bd25RegionArg;
use crate::error::CliError;

#[allow(clippy::too_many_arguments)]
pub(crate) fn run_create(
    iso: PathBuf,
    key: Option<String>,
    key_file: Option<PathBuf>,
    getkey_log: Option<PathBuf>,
    region: Option<Bd25RegionArg>,
    layerbreak: Option<u64>,
    reproducible: bool,
    version: u8,
    exact_ird: bool,
    output: PathBuf,
) -> Result<(), CliError> {
    let key_source = resolve_key_source(key, key_file, getkey_log, region)?;
    let file = File::open(&iso)?;

    let (tx, rx) = mpsc::channel::<StatusUpdate>();

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "  {spinner:.cyan} {msg} {wide_bar:.cyan/blue} {pos}/{len} sectors",
        )
        .expect("static pattern")
        .tick_chars("/-\\|"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    let reporter = std::thread::spawn(move || {
        for update in rx {
            match update {
                StatusUpdate::DiscoveringExtents => pb.set_message("discovering extents"),
                StatusUpdate::StreamingProgress {
                    sector,
                    total_sectors,
                } => {
                    pb.set_length(total_sectors);
                    pb.set_position(sector);
                    pb.set_message("streaming");
                }
                StatusUpdate::Warning(msg) => pb.suspend(|| log::warn!("{msg}")),
                StatusUpdate::HeaderFooterCaptured => pb.set_message("header/footer captured"),
                StatusUpdate::Writing => pb.set_message("writing"),
                StatusUpdate::Done => pb.set_message("done"),
            }
        }
        pb.finish_and_clear();
    });

    let options = EngineOptions {
        reproducible,
        layerbreak,
        version,
        exact_ird,
    };

    let record = generate_ird(file, key_source, options, Some(tx));
    let _ = reporter.join();
    let record = record?;

    record.write_to_file(&output)?;

    log::info!(
        "{} wrote {} (v{})",
        "\u{2714}".if_supports_color(Stdout, |t| t.green()),
        output.display(),
        record.version,
    );

    Ok(())
}

fn resolve_key_source(
    key: Option<String>,
    key_file: Option<PathBuf>,
    getkey_log: Option<PathBuf>,
    region: Option<Bd25RegionArg>,
) -> Result<KeySource, CliError> {
    if let Some(path) = getkey_log {
        return Ok(KeySource::GetKeyLog(path));
    }

    let hex_str = if let Some(k) = key {
        k
    } else if let Some(path) = key_file {
        std::fs::read_to_string(&path)?
    } else {
        return Err(CliError::usage(
            "one of --key, --key-file, or --getkey-log is required",
        ));
    };

    let bytes = decode_disc_key(&hex_str)?;

    Ok(match region {
        Some(r) => KeySource::DiscKeyAndId(bytes, DiscId::bd25(r.into())),
        None => KeySource::DiscKey(bytes),
    })
}

fn decode_disc_key(hex_str: &str) -> Result<[u8; 16], CliError> {
    let hex_str = hex_str.trim();
    if hex_str.len() != 32 {
        return Err(CliError::usage("DiscKey must be exactly 32 hex characters"));
    }
    let bytes = hex::decode(hex_str).map_err(|_| CliError::usage("DiscKey is not valid hex"))?;
    bytes
        .try_into()
        .map_err(|_| CliError::usage("DiscKey must decode to 16 bytes"))
}
