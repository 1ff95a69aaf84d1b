use std::fs;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;
use serde::Serialize;

use ird_format::IrdRecord;

use crate::error::CliError;

#[derive(Serialize)]
struct IrdSummary {
    version: u8,
    title_id: String,
    title: String,
    system_version: String,
    disc_version: String,
    app_version: String,
    uid: u32,
    region_count: usize,
    file_count: usize,
    extra_config: u16,
    attachments: u16,
    reproducible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    region_hashes: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_entries: Option<Vec<(i64, String)>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pic: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data1_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data2_key: Option<String>,
}

pub(crate) fn run_info(path: PathBuf, json: bool, all: bool) -> Result<(), CliError> {
    let bytes = fs::read(&path)?;
    let record = IrdRecord::read(&bytes)?;

    let summary = IrdSummary {
        version: record.version,
        title_id: record.title_id.clone(),
        title: record.title.clone(),
        system_version: record.system_version.clone(),
        disc_version: record.disc_version.clone(),
        app_version: record.app_version.clone(),
        uid: record.uid,
        region_count: record.region_hashes.len(),
        file_count: record.file_entries.len(),
        extra_config: record.extra_config,
        attachments: record.attachments,
        reproducible: record.extra_config & 0x0001 != 0,
        region_hashes: all.then(|| record.region_hashes.iter().map(hex::encode).collect()),
        file_entries: all.then(|| {
            record
                .file_entries
                .iter()
                .map(|(key, md5)| (*key, hex::encode(md5)))
                .collect()
        }),
        pic: all.then(|| hex::encode(record.pic)),
        data1_key: all.then(|| hex::encode(record.data1_key)),
        data2_key: all.then(|| hex::encode(record.data2_key)),
    };

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).expect("summary always serializes")
        );
        return Ok(());
    }

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &IrdSummary) {
    println!(
        "{} {}",
        "Title:".if_supports_color(Stdout, |t| t.cyan()),
        summary.title,
    );
    println!(
        "{} {}",
        "TitleID:".if_supports_color(Stdout, |t| t.cyan()),
        summary.title_id,
    );
    println!(
        "{} {} ({})",
        "Version:".if_supports_color(Stdout, |t| t.cyan()),
        summary.version,
        if summary.reproducible {
            "reproducible"
        } else {
            "ordinary"
        },
    );
    println!(
        "{} 0x{:08X}",
        "UID:".if_supports_color(Stdout, |t| t.cyan()),
        summary.uid,
    );
    println!(
        "{} {}",
        "SystemVersion:".if_supports_color(Stdout, |t| t.cyan()),
        summary.system_version,
    );
    println!(
        "{} {}",
        "DiscVersion:".if_supports_color(Stdout, |t| t.cyan()),
        summary.disc_version,
    );
    println!(
        "{} {}",
        "AppVersion:".if_supports_color(Stdout, |t| t.cyan()),
        summary.app_version,
    );
    println!(
        "{} {}",
        "Regions:".if_supports_color(Stdout, |t| t.cyan()),
        summary.region_count,
    );
    println!(
        "{} {}",
        "Files:".if_supports_color(Stdout, |t| t.cyan()),
        summary.file_count,
    );

    if let Some(region_hashes) = &summary.region_hashes {
        println!(
            "{}",
            "Region hashes:".if_supports_color(Stdout, |t| t.bright_magenta())
        );
        for (i, hash) in region_hashes.iter().enumerate() {
            println!("  [{i}] {hash}");
        }
    }
    if let Some(file_entries) = &summary.file_entries {
        println!(
            "{}",
            "File hashes:".if_supports_color(Stdout, |t| t.bright_magenta())
        );
        for (key, hash) in file_entries {
            println!("  {key:>12} {hash}");
        }
    }
    if let Some(pic) = &summary.pic {
        println!("{} {}", "PIC:".if_supports_color(Stdout, |t| t.cyan()), pic);
    }
    if let Some(data1_key) = &summary.data1_key {
        println!(
            "{} {}",
            "Data1Key:".if_supports_color(Stdout, |t| t.cyan()),
            data1_key,
        );
    }
    if let Some(data2_key) = &summary.data2_key {
        println!(
            "{} {}",
            "Data2Key:".if_supports_color(Stdout, |t| t.cyan()),
            data2_key,
        );
    }
}
