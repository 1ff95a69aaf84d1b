//! The IRD generation engine: extent discovery followed by a single
//! forward streaming pass over the ISO that computes every hash while
//! decrypting encrypted sectors in place.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::Write;

use ird_core::crypto::{decrypt_blocks, sector_iv};
use ird_core::{StatusUpdate, StreamingCrc32, StreamingMd5};
use ird_iso9660::{Extent, Iso9660Reader, TreeEntry};

use crate::container::IrdRecord;
use crate::error::IrdError;
use crate::keys::{DiscId, DiscKey};
use crate::{getkey_log, pic, sfb, sfo};

const SECTOR_SIZE: u64 = 2048;
const STREAM_BUFFER_SECTORS: u64 = 1024;
const STREAM_BUFFER_BYTES: u64 = STREAM_BUFFER_SECTORS * SECTOR_SIZE;

/// Where to obtain the disc decryption key (and, for BD-25, the DiscID)
/// from.
pub enum KeySource {
    /// A directly-supplied 16-byte DiscKey; DiscID is derived from the
    /// ISO size (BD-50) or must be supplied separately by the caller for
    /// BD-25 via [`KeySource::DiscKeyAndId`].
    DiscKey([u8; 16]),
    /// A DiscKey paired with an explicit DiscID (e.g. a known BD-25
    /// region code).
    DiscKeyAndId([u8; 16], DiscId),
    /// A GetKey-tool text log to parse for DiscKey, DiscID, and PIC.
    GetKeyLog(PathBuf),
}

/// Generation parameters controlling IRD shape.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Build a reproducible ("redump-style") IRD: UID = CRC-32(ISO).
    pub reproducible: bool,
    /// Explicit layerbreak byte offset, required for hybrid BD-Video
    /// BD-50 discs.
    pub layerbreak: Option<u64>,
    pub version: u8,
    /// Overwrite PIC byte 114 with the 3k3y-style exact-IRD marker.
    pub exact_ird: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            reproducible: false,
            layerbreak: None,
            version: 9,
            exact_ird: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Region {
    start: u32,
    end: u32,
    encrypted: bool,
}

#[derive(Debug, Clone, Copy)]
struct FileTableEntry {
    file_key: i64,
    extent: Extent,
}

fn send(tx: &Option<Sender<StatusUpdate>>, update: StatusUpdate) {
    if let Some(tx) = tx {
        let _ = tx.send(update);
    }
}

/// Generate an IRD from an ISO image.
pub fn generate_ird<R: Read + Seek>(
    iso: R,
    key_source: KeySource,
    options: EngineOptions,
    status_tx: Option<Sender<StatusUpdate>>,
) -> Result<IrdRecord, IrdError> {
    send(&status_tx, StatusUpdate::DiscoveringExtents);

    let mut fs = Iso9660Reader::open(iso)?;
    let tree = fs.walk()?;

    let sfo_metadata = read_optional_sfo(&mut fs);
    let title_id = sfo_metadata
        .as_ref()
        .and_then(|s| s.get("TITLE_ID"))
        .unwrap_or("")
        .to_string();
    let title = sfo_metadata
        .as_ref()
        .and_then(|s| s.get("TITLE"))
        .unwrap_or("")
        .to_string();
    let disc_version = sfo_metadata
        .as_ref()
        .and_then(|s| s.get("VERSION"))
        .unwrap_or("")
        .to_string();
    let app_version = sfo_metadata
        .as_ref()
        .and_then(|s| s.get("APP_VER"))
        .unwrap_or("")
        .to_string();

    let first_data_sector = find_first_data_sector(&mut fs)?;
    let (update_end, update_start_sector) = find_update_end(&mut fs, &tree)?;
    let has_bdmv = fs.has_directory("/BDMV")?;

    let mut iso = fs.into_inner();

    let system_version = extract_system_version(&mut iso, update_start_sector)?;

    // Large enough to hold the region boundary table even at the
    // maximum RegionCount of 255.
    let mut header_bytes = vec![0u8; 8 + 255 * 4];
    iso.seek(SeekFrom::Start(0))?;
    let read = read_best_effort(&mut iso, &mut header_bytes)?;
    header_bytes.truncate(read);
    let regions = parse_region_table(&header_bytes, first_data_sector, update_end)?;
    if regions.is_empty() {
        return Err(IrdError::NoRegions);
    }

    let file_table = build_file_table(&tree);

    let (disc_key, disc_id_hint) = resolve_disc_key(&key_source)?;

    iso.seek(SeekFrom::End(0))?;
    let iso_size = iso.stream_position()?;

    let (region_hashes, file_hashes, global_crc) =
        streaming_pass(&mut iso, &regions, &file_table, &disc_key, &status_tx)?;

    let header = gzip_range(&mut iso, 0, first_data_sector as u64 * SECTOR_SIZE)?;
    let footer = gzip_range(&mut iso, update_end, iso_size)?;
    send(&status_tx, StatusUpdate::HeaderFooterCaptured);

    let uid = if options.reproducible { global_crc } else { 0 };

    let disc_id = match disc_id_hint {
        Some(id) => id,
        None if iso_size > pic::BD_LAYER_SIZE => DiscId::bd50(),
        None => {
            return Err(IrdError::invalid_argument(
                "BD-25 disc requires an explicit DiscID region code",
            ));
        }
    };

    let pic_bytes = pic::synthesize(iso_size, options.layerbreak, options.exact_ird, has_bdmv)?;

    let data1_key = disc_key.to_data1_key();
    let data2_key = disc_id.to_data2_key();

    let extra_config: u16 = if options.reproducible { 0x0001 } else { 0x0000 };

    send(&status_tx, StatusUpdate::Writing);

    let mut file_entries: Vec<(i64, [u8; 16])> = file_hashes;
    file_entries.sort_by_key(|(key, _)| *key);

    let record = IrdRecord {
        version: options.version,
        title_id,
        title,
        system_version,
        disc_version,
        app_version,
        uid,
        header,
        footer,
        region_hashes,
        file_entries,
        extra_config,
        attachments: 0,
        pic: pic_bytes,
        data1_key: *data1_key.as_bytes(),
        data2_key: *data2_key.as_bytes(),
    };

    send(&status_tx, StatusUpdate::Done);
    Ok(record)
}

fn resolve_disc_key(key_source: &KeySource) -> Result<(DiscKey, Option<DiscId>), IrdError> {
    match key_source {
        KeySource::DiscKey(bytes) => Ok((DiscKey(*bytes), None)),
        KeySource::DiscKeyAndId(bytes, id) => Ok((DiscKey(*bytes), Some(*id))),
        KeySource::GetKeyLog(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|_| IrdError::file_not_found(path.display().to_string()))?;
            let parsed = getkey_log::parse(&text)?;
            Ok((parsed.disc_key, Some(parsed.disc_id)))
        }
    }
}

fn read_optional_sfo<R: Read + Seek>(fs: &mut Iso9660Reader<R>) -> Option<sfo::ParamSfo> {
    let bytes = fs.read_file("PS3_GAME/PARAM.SFO").ok()?;
    sfo::ParamSfo::parse(std::io::Cursor::new(bytes)).ok()
}

fn find_first_data_sector<R: Read + Seek>(fs: &mut Iso9660Reader<R>) -> Result<u32, IrdError> {
    let extent = fs
        .find("PS3_DISC.SFB")?
        .ok_or_else(|| IrdError::invalid_iso("ISO is missing PS3_DISC.SFB"))?;

    // Reading the SFB itself is only to validate it parses; metadata
    // read failures here are downgraded, never fatal.
    if let Ok(bytes) = fs.read_file("PS3_DISC.SFB") {
        let _ = sfb::DiscSfb::parse(std::io::Cursor::new(bytes));
    }

    Ok(extent.start_sector)
}

/// Returns `(UpdateEnd, PUP start sector)`: UpdateEnd is the byte-past-end
/// used by region/footer extent math, the start sector is where
/// `extract_system_version` must probe from (spec §4.7.1 anchors the
/// `"SCEUF"` magic and `version_offset` to the PUP's *start*, not its end).
fn find_update_end<R: Read + Seek>(
    fs: &mut Iso9660Reader<R>,
    tree: &[TreeEntry],
) -> Result<(u64, u32), IrdError> {
    if let Some(extent) = fs.find("PS3_UPDATE/PS3UPDAT.PUP")? {
        let end = extent.start_sector as u64 * SECTOR_SIZE + extent.byte_length as u64;
        return Ok((end, extent.start_sector));
    }

    let last = tree
        .iter()
        .filter(|e| !e.is_directory)
        .max_by_key(|e| e.extent.start_sector as u64 * SECTOR_SIZE + e.extent.byte_length as u64);

    match last {
        Some(entry) => {
            let end = entry.extent.start_sector as u64 * SECTOR_SIZE + entry.extent.byte_length as u64;
            Ok((end, entry.extent.start_sector))
        }
        None => Err(IrdError::invalid_iso("ISO contains no files")),
    }
}

fn extract_system_version<R: Read + Seek>(
    iso: &mut R,
    update_start_sector: u32,
) -> Result<String, IrdError> {
    // Anchored to the PUP's start sector, not UpdateEnd: metadata failures
    // here fall back to NULs rather than aborting generation.
    let update_start = update_start_sector as u64 * SECTOR_SIZE;
    if iso.seek(SeekFrom::Start(update_start)).is_err() {
        return Ok("\0\0\0\0".to_string());
    }

    let mut magic = [0u8; 5];
    if iso.read_exact(&mut magic).is_err() || &magic != b"SCEUF" {
        return Ok("\0\0\0\0".to_string());
    }

    if iso.seek(SeekFrom::Start(update_start + 0x3E)).is_err() {
        return Ok("\0\0\0\0".to_string());
    }
    let mut offset_bytes = [0u8; 2];
    if iso.read_exact(&mut offset_bytes).is_err() {
        return Ok("\0\0\0\0".to_string());
    }
    let version_offset = u16::from_be_bytes(offset_bytes) as u64;

    if iso
        .seek(SeekFrom::Start(update_start + version_offset))
        .is_err()
    {
        return Ok("\0\0\0\0".to_string());
    }
    let mut version_bytes = [0u8; 4];
    if iso.read_exact(&mut version_bytes).is_err() {
        return Ok("\0\0\0\0".to_string());
    }

    Ok(ird_core::util::read_ascii_nul(&version_bytes))
}

/// Parse the region boundary table from the first bytes of the ISO.
fn parse_region_table(
    header: &[u8],
    first_data_sector: u32,
    update_end: u64,
) -> Result<Vec<Region>, IrdError> {
    if header.len() < 4 {
        return Err(IrdError::NoRegions);
    }
    let u = u32::from_be_bytes(header[0..4].try_into().unwrap());
    if u == 0 {
        return Err(IrdError::NoRegions);
    }
    let region_count = 2 * u as usize - 1;

    let needed = 8 + region_count * 4;
    if header.len() < needed {
        return Err(IrdError::invalid_iso(
            "ISO header is too short to hold its declared region table",
        ));
    }

    let mut boundaries = Vec::with_capacity(region_count);
    for i in 0..region_count {
        let offset = 8 + i * 4;
        boundaries.push(u32::from_be_bytes(
            header[offset..offset + 4].try_into().unwrap(),
        ));
    }

    let last_end_sector = (update_end / SECTOR_SIZE).saturating_sub(1) as u32;

    let mut regions = Vec::with_capacity(region_count);
    for i in 0..region_count {
        let encrypted = i % 2 == 1;
        let is_last = i == region_count - 1;

        let start = if encrypted {
            regions[i - 1].end + 1
        } else {
            boundaries[i]
        };

        let end = if is_last {
            last_end_sector
        } else if encrypted {
            boundaries[i + 1] - 1
        } else {
            boundaries[i + 1]
        };

        regions.push(Region {
            start,
            end,
            encrypted,
        });
    }

    if let Some(first) = regions.first_mut() {
        first.start = first.start.max(first_data_sector);
    }

    Ok(regions)
}

fn build_file_table(tree: &[TreeEntry]) -> Vec<FileTableEntry> {
    let mut seen_keys = std::collections::HashSet::new();
    let mut entries = Vec::new();

    for node in tree.iter().filter(|e| !e.is_directory) {
        let file_key = node.extent.start_sector as i64;
        if !seen_keys.insert(file_key) {
            continue;
        }
        entries.push(FileTableEntry {
            file_key,
            extent: node.extent,
        });
    }

    entries.sort_by_key(|e| e.file_key);
    entries
}

struct OpenRegion {
    index: usize,
    md5: StreamingMd5,
}

struct OpenFile {
    file_key: i64,
    md5: StreamingMd5,
}

#[allow(clippy::type_complexity)]
fn streaming_pass<R: Read + Seek>(
    iso: &mut R,
    regions: &[Region],
    file_table: &[FileTableEntry],
    disc_key: &DiscKey,
    status_tx: &Option<Sender<StatusUpdate>>,
) -> Result<(Vec<[u8; 16]>, Vec<(i64, [u8; 16])>, u32), IrdError> {
    iso.seek(SeekFrom::Start(0))?;

    let total_size = {
        let pos = iso.stream_position()?;
        let end = iso.seek(SeekFrom::End(0))?;
        iso.seek(SeekFrom::Start(pos))?;
        end
    };
    let total_sectors = total_size / SECTOR_SIZE;

    let mut global_crc = StreamingCrc32::new();
    let mut region_hashes: Vec<Option<[u8; 16]>> = vec![None; regions.len()];
    let mut file_hashes: Vec<(i64, [u8; 16])> = Vec::with_capacity(file_table.len());

    let mut open_regions: Vec<OpenRegion> = Vec::new();
    let mut next_region_idx = 0usize;
    let mut open_files: Vec<OpenFile> = Vec::new();
    let mut next_file_idx = 0usize;

    let mut cur_sector: u64 = 0;
    let mut buffer = vec![0u8; STREAM_BUFFER_BYTES as usize];

    while cur_sector < total_sectors {
        let bytes_read = read_best_effort(iso, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }

        let aligned_len = (bytes_read as u64 / SECTOR_SIZE) * SECTOR_SIZE;
        if aligned_len < bytes_read as u64 {
            log::warn!(
                "short read at sector {cur_sector}: {} trailing bytes dropped",
                bytes_read as u64 - aligned_len
            );
        }
        if aligned_len == 0 {
            break;
        }
        let buf = &mut buffer[..aligned_len as usize];
        let buf_sectors = aligned_len / SECTOR_SIZE;
        let buf_end_sector_exclusive = cur_sector + buf_sectors;

        global_crc.update(buf);

        while next_region_idx < regions.len()
            && (regions[next_region_idx].start as u64) < buf_end_sector_exclusive
        {
            open_regions.push(OpenRegion {
                index: next_region_idx,
                md5: StreamingMd5::new(),
            });
            next_region_idx += 1;
        }

        for open in &mut open_regions {
            let region = &regions[open.index];
            let overlap_start = (region.start as u64).max(cur_sector);
            let overlap_end_excl = ((region.end as u64) + 1).min(buf_end_sector_exclusive);
            if overlap_start >= overlap_end_excl {
                continue;
            }
            let byte_start = ((overlap_start - cur_sector) * SECTOR_SIZE) as usize;
            let byte_end = ((overlap_end_excl - cur_sector) * SECTOR_SIZE) as usize;
            open.md5.update(&buf[byte_start..byte_end]);
        }

        for region in regions.iter().filter(|r| r.encrypted) {
            let overlap_start = (region.start as u64).max(cur_sector);
            let overlap_end_excl = ((region.end as u64) + 1).min(buf_end_sector_exclusive);
            if overlap_start >= overlap_end_excl {
                continue;
            }
            for sector in overlap_start..overlap_end_excl {
                let byte_start = ((sector - cur_sector) * SECTOR_SIZE) as usize;
                let byte_end = byte_start + SECTOR_SIZE as usize;
                let iv = sector_iv(sector as u32);
                decrypt_blocks(&disc_key.0, &iv, &mut buf[byte_start..byte_end]);
            }
        }

        open_regions.retain(|open| {
            let region = &regions[open.index];
            if (region.end as u64) < buf_end_sector_exclusive {
                region_hashes[open.index] = Some(open.md5.clone().finalize());
                false
            } else {
                true
            }
        });

        while next_file_idx < file_table.len()
            && (file_table[next_file_idx].extent.start_sector as u64) < buf_end_sector_exclusive
        {
            open_files.push(OpenFile {
                file_key: file_table[next_file_idx].file_key,
                md5: StreamingMd5::new(),
            });
            next_file_idx += 1;
        }

        for open in &mut open_files {
            let entry = file_table
                .iter()
                .find(|e| e.file_key == open.file_key)
                .expect("open file always has a matching table entry");
            let extent = entry.extent;
            let overlap_start = (extent.start_sector as u64).max(cur_sector);
            let overlap_end_excl =
                (extent.end_sector_exclusive() as u64).min(buf_end_sector_exclusive);
            if overlap_start >= overlap_end_excl {
                continue;
            }
            let byte_start = ((overlap_start - cur_sector) * SECTOR_SIZE) as usize;
            // The last sector of a file may only be partially used by
            // the file's declared byte length; clamp the final sector's
            // contribution accordingly.
            let file_end_byte = extent.start_sector as u64 * SECTOR_SIZE + extent.byte_length as u64;
            let buf_overlap_end_byte = (overlap_end_excl - cur_sector) * SECTOR_SIZE;
            let absolute_overlap_end_byte =
                (cur_sector * SECTOR_SIZE + buf_overlap_end_byte).min(file_end_byte);
            let byte_end = byte_start
                + (absolute_overlap_end_byte - (cur_sector * SECTOR_SIZE + byte_start as u64))
                    as usize;
            if byte_end > byte_start {
                open.md5.update(&buf[byte_start..byte_end]);
            }
        }

        open_files.retain(|open| {
            let entry = file_table
                .iter()
                .find(|e| e.file_key == open.file_key)
                .expect("open file always has a matching table entry");
            if (entry.extent.end_sector_exclusive() as u64) <= buf_end_sector_exclusive {
                file_hashes.push((open.file_key, open.md5.clone().finalize()));
                false
            } else {
                true
            }
        });

        cur_sector = buf_end_sector_exclusive;
        send(
            status_tx,
            StatusUpdate::StreamingProgress {
                sector: cur_sector,
                total_sectors,
            },
        );
    }

    for open in open_regions {
        region_hashes[open.index] = Some(open.md5.finalize());
    }
    for open in open_files {
        file_hashes.push((open.file_key, open.md5.finalize()));
    }

    let final_region_hashes: Vec<[u8; 16]> = region_hashes
        .into_iter()
        .map(|h| h.unwrap_or([0u8; 16]))
        .collect();

    let crc = global_crc.finalize();
    Ok((final_region_hashes, file_hashes, crc))
}

fn read_best_effort<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize, IrdError> {
    let mut total = 0;
    while total < buf.len() {
        match reader.read(&mut buf[total..])? {
            0 => break,
            n => total += n,
        }
    }
    Ok(total)
}

fn gzip_range<R: Read + Seek>(iso: &mut R, start: u64, end: u64) -> Result<Vec<u8>, IrdError> {
    iso.seek(SeekFrom::Start(start))?;
    let len = end.saturating_sub(start);
    let mut remaining = len;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    let mut chunk = vec![0u8; 64 * 1024];
    while remaining > 0 {
        let want = remaining.min(chunk.len() as u64) as usize;
        let read = read_best_effort(iso, &mut chunk[..want])?;
        if read == 0 {
            break;
        }
        encoder.write_all(&chunk[..read])?;
        remaining -= read as u64;
    }
    let mut compressed = encoder.finish()?;
    if compressed.len() >= 8 {
        compressed[4..8].copy_from_slice(&[0, 0, 0, 0]);
    }
    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_table_matches_spec_boundary_example() {
        // U = 3 -> RegionCount = 5, boundaries [A, B, C, D, E].
        let (a, b, c, d, e) = (100u32, 200u32, 300u32, 400u32, 500u32);
        let mut header = vec![0u8; 8 + 5 * 4];
        header[0..4].copy_from_slice(&3u32.to_be_bytes());
        for (i, v) in [a, b, c, d, e].iter().enumerate() {
            header[8 + i * 4..12 + i * 4].copy_from_slice(&v.to_be_bytes());
        }

        let update_end = (e as u64 + 50) * SECTOR_SIZE;
        let regions = parse_region_table(&header, 10, update_end).unwrap();

        assert_eq!(regions.len(), 5);
        assert_eq!((regions[0].start, regions[0].end), (a, b));
        assert_eq!((regions[1].start, regions[1].end), (b + 1, c - 1));
        assert_eq!((regions[2].start, regions[2].end), (c, d));
        assert_eq!((regions[3].start, regions[3].end), (d + 1, e - 1));
        assert_eq!(regions[4].start, e);
        assert_eq!(regions[4].end, (update_end / SECTOR_SIZE) as u32 - 1);
    }

    #[test]
    fn region_zero_start_clamps_to_first_data_sector() {
        let mut header = vec![0u8; 8 + 4];
        header[0..4].copy_from_slice(&1u32.to_be_bytes());
        header[8..12].copy_from_slice(&5u32.to_be_bytes());
        let regions = parse_region_table(&header, 50, 100 * SECTOR_SIZE).unwrap();
        assert_eq!(regions[0].start, 50);
    }

    #[test]
    fn single_region_spans_first_data_sector_to_update_end() {
        let mut header = vec![0u8; 8 + 4];
        header[0..4].copy_from_slice(&1u32.to_be_bytes());
        header[8..12].copy_from_slice(&0u32.to_be_bytes());
        let update_end = 200 * SECTOR_SIZE;
        let regions = parse_region_table(&header, 10, update_end).unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].start, 10);
        assert_eq!(regions[0].end, 199);
        assert!(!regions[0].encrypted);
    }

    #[test]
    fn zero_u_is_no_regions() {
        let header = vec![0u8; 12];
        assert!(parse_region_table(&header, 0, 0).is_err());
    }

    #[test]
    fn file_table_dedups_and_sorts_by_file_key() {
        let tree = vec![
            TreeEntry {
                path: "B.BIN".to_string(),
                extent: Extent {
                    start_sector: 200,
                    byte_length: 2048,
                },
                is_directory: false,
                interleaved: false,
            },
            TreeEntry {
                path: "A.BIN".to_string(),
                extent: Extent {
                    start_sector: 100,
                    byte_length: 2048,
                },
                is_directory: false,
                interleaved: false,
            },
            TreeEntry {
                path: "DUP.BIN".to_string(),
                extent: Extent {
                    start_sector: 100,
                    byte_length: 4096,
                },
                is_directory: false,
                interleaved: false,
            },
            TreeEntry {
                path: "SUBDIR".to_string(),
                extent: Extent {
                    start_sector: 5,
                    byte_length: 2048,
                },
                is_directory: true,
                interleaved: false,
            },
        ];

        let table = build_file_table(&tree);
        assert_eq!(table.len(), 2);
        assert_eq!(table[0].file_key, 100);
        assert_eq!(table[1].file_key, 200);
    }

    // -- Synthetic-ISO helpers for read_optional_sfo / extract_system_version --

    const FLAG_DIRECTORY: u8 = 0x02;

    fn make_dir_record(identifier: &str, extent_lba: u32, data_length: u32, is_dir: bool) -> Vec<u8> {
        let id_bytes = identifier.as_bytes();
        let id_len = id_bytes.len();
        let record_len = 33 + id_len + (id_len % 2);
        let mut record = vec![0u8; record_len];
        record[0] = record_len as u8;
        record[2..6].copy_from_slice(&extent_lba.to_le_bytes());
        record[6..10].copy_from_slice(&extent_lba.to_be_bytes());
        record[10..14].copy_from_slice(&data_length.to_le_bytes());
        record[14..18].copy_from_slice(&data_length.to_be_bytes());
        record[25] = if is_dir { FLAG_DIRECTORY } else { 0 };
        record[32] = id_len as u8;
        record[33..33 + id_len].copy_from_slice(id_bytes);
        record
    }

    fn make_pvd_sector(root_lba: u32, root_len: u32) -> [u8; 2048] {
        let mut sector = [0u8; 2048];
        sector[0] = 0x01;
        sector[1..6].copy_from_slice(b"CD001");
        sector[6] = 0x01;
        sector[80..84].copy_from_slice(&200u32.to_le_bytes());
        sector[84..88].copy_from_slice(&200u32.to_be_bytes());
        let root = make_dir_record("\0", root_lba, root_len, true);
        sector[156..156 + root.len()].copy_from_slice(&root);
        sector
    }

    /// A minimal single-entry PARAM.SFO: one NUL-trimmed UTF-8 `TITLE_ID`.
    fn make_param_sfo(title_id: &str) -> Vec<u8> {
        let mut value = title_id.as_bytes().to_vec();
        value.push(0);

        let key_table = b"TITLE_ID\0\0\0\0"; // padded to a 4-byte multiple
        let header_len = 20u32;
        let descriptors_len = 16u32;
        let key_table_offset = header_len + descriptors_len;
        let data_table_offset = key_table_offset + key_table.len() as u32;

        let mut buf = Vec::new();
        buf.extend_from_slice(b"\0PSF");
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&key_table_offset.to_le_bytes());
        buf.extend_from_slice(&data_table_offset.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());

        buf.extend_from_slice(&0u16.to_le_bytes()); // key_offset
        buf.extend_from_slice(&0x0204u16.to_le_bytes()); // NUL-trimmed UTF-8
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes()); // data_offset

        buf.extend_from_slice(key_table);
        buf.extend_from_slice(&value);
        buf
    }

    /// Build a tiny ISO: PVD at sector 16, root at 17 (containing a
    /// `PS3_GAME` subdirectory at 18), `PS3_GAME` at 18 (containing
    /// `PARAM.SFO` at 19).
    fn make_test_iso_with_nested_param_sfo(title_id: &str) -> Vec<u8> {
        let mut data = vec![0u8; 16 * 2048];
        data.extend_from_slice(&make_pvd_sector(17, 2048));

        let mut root_sector = [0u8; 2048];
        let dot = make_dir_record("\0", 17, 2048, true);
        let dotdot = make_dir_record("\x01", 17, 2048, true);
        let game_dir = make_dir_record("PS3_GAME", 18, 2048, true);
        let mut pos = 0;
        for rec in [&dot, &dotdot, &game_dir] {
            root_sector[pos..pos + rec.len()].copy_from_slice(rec);
            pos += rec.len();
        }
        data.extend_from_slice(&root_sector);

        let sfo_bytes = make_param_sfo(title_id);
        let mut game_sector = [0u8; 2048];
        let dot = make_dir_record("\0", 18, 2048, true);
        let dotdot = make_dir_record("\x01", 17, 2048, true);
        let param_sfo = make_dir_record("PARAM.SFO", 19, sfo_bytes.len() as u32, false);
        let mut pos = 0;
        for rec in [&dot, &dotdot, &param_sfo] {
            game_sector[pos..pos + rec.len()].copy_from_slice(rec);
            pos += rec.len();
        }
        data.extend_from_slice(&game_sector);

        let mut sfo_sector = vec![0u8; 2048];
        sfo_sector[..sfo_bytes.len()].copy_from_slice(&sfo_bytes);
        data.extend_from_slice(&sfo_sector);

        data
    }

    #[test]
    fn read_optional_sfo_resolves_nested_ps3_game_path() {
        let iso = make_test_iso_with_nested_param_sfo("BLES00001");
        let mut fs = Iso9660Reader::open(std::io::Cursor::new(iso)).unwrap();
        let sfo = read_optional_sfo(&mut fs).expect("PARAM.SFO under PS3_GAME should be found");
        assert_eq!(sfo.get("TITLE_ID"), Some("BLES00001"));
    }

    #[test]
    fn extract_system_version_probes_pup_start_not_update_end() {
        // PUP occupies sectors 20..23 (3 sectors); UpdateEnd is the byte
        // past its last sector, far from where "SCEUF" actually lives.
        let update_start_sector = 20u32;
        let pup_sectors = 3u64;
        let mut iso = vec![0u8; (update_start_sector as u64 + pup_sectors) as usize * 2048];

        let pup_start = update_start_sector as u64 * SECTOR_SIZE;
        iso[pup_start as usize..pup_start as usize + 5].copy_from_slice(b"SCEUF");
        // version_offset at update_start+0x3E, pointing at update_start+0x100.
        let version_offset: u16 = 0x100;
        iso[(pup_start + 0x3E) as usize..(pup_start + 0x40) as usize]
            .copy_from_slice(&version_offset.to_be_bytes());
        iso[(pup_start + version_offset as u64) as usize
            ..(pup_start + version_offset as u64) as usize + 4]
            .copy_from_slice(b"4.80");

        let mut cursor = std::io::Cursor::new(iso);
        let version = extract_system_version(&mut cursor, update_start_sector).unwrap();
        assert_eq!(version, "4.80");
    }
}
