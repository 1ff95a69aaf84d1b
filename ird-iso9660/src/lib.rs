//! A minimal, read-only ISO9660 filesystem reader.
//!
//! This is the "ISO9660 filesystem reader" collaborator the IRD engine
//! treats as an external dependency: directory enumeration and
//! path→cluster-extent lookup, nothing else. PS3 discs are always
//! straight 2048-byte-sector ISO images (no CD sync/subheader framing),
//! so unlike a CD-based reader there's exactly one sector layout to
//! support.

pub mod error;

use std::io::{Read, Seek, SeekFrom};

pub use error::Iso9660Error;
use ird_core::ReadSeek;

/// Sector size for all ISO9660 reads (user-data bytes per sector).
pub const SECTOR_SIZE: u64 = 2048;

/// PVD always lives at logical sector 16.
pub const PVD_SECTOR: u32 = 16;

/// A contiguous run of sectors backing a file or directory's data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    pub start_sector: u32,
    pub byte_length: u32,
}

impl Extent {
    /// Number of sectors spanned, rounding up.
    pub fn sector_count(&self) -> u32 {
        ird_core::util::ceil_div(self.byte_length as u64, SECTOR_SIZE) as u32
    }

    /// The sector one past the end of this extent.
    pub fn end_sector_exclusive(&self) -> u32 {
        self.start_sector + self.sector_count()
    }
}

/// A parsed Primary Volume Descriptor.
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    pub system_identifier: String,
    pub volume_identifier: String,
    pub volume_space_size: u32,
    pub root_extent: Extent,
}

/// A single entry discovered while walking the directory tree.
#[derive(Debug, Clone)]
pub struct TreeEntry {
    /// Full path from the root, `/`-separated, uppercase, version suffix
    /// (`;1`) stripped.
    pub path: String,
    pub extent: Extent,
    pub is_directory: bool,
    /// True if the directory record declared non-zero file-unit-size or
    /// interleave-gap fields, meaning its data may be interleaved rather
    /// than a single contiguous run — unsupported here (see SPEC_FULL.md).
    pub interleaved: bool,
}

/// A parsed ISO9660 directory record (33+ bytes, before identifier padding).
struct DirectoryRecord {
    extent: Extent,
    file_flags: u8,
    file_unit_size: u8,
    interleave_gap_size: u8,
    identifier: String,
}

const FLAG_DIRECTORY: u8 = 0x02;

fn parse_directory_record(data: &[u8]) -> Option<DirectoryRecord> {
    let record_len = *data.first()? as usize;
    if record_len < 33 || record_len > data.len() {
        return None;
    }
    let extent_lba = u32::from_le_bytes(data[2..6].try_into().ok()?);
    let data_length = u32::from_le_bytes(data[10..14].try_into().ok()?);
    let file_flags = data[25];
    let file_unit_size = data[26];
    let interleave_gap_size = data[27];
    let id_len = data[32] as usize;
    if 33 + id_len > record_len {
        return None;
    }

    let identifier = if id_len == 1 && data[33] == 0x00 {
        ".".to_string()
    } else if id_len == 1 && data[33] == 0x01 {
        "..".to_string()
    } else {
        String::from_utf8_lossy(&data[33..33 + id_len]).into_owned()
    };

    Some(DirectoryRecord {
        extent: Extent {
            start_sector: extent_lba,
            byte_length: data_length,
        },
        file_flags,
        file_unit_size,
        interleave_gap_size,
        identifier,
    })
}

/// Strip the ISO9660 version suffix (`;1`) from a file identifier.
fn strip_version(identifier: &str) -> &str {
    identifier.split(';').next().unwrap_or(identifier)
}

/// A read-only ISO9660 filesystem reader over any `Read + Seek` source.
pub struct Iso9660Reader<R: ReadSeek> {
    reader: R,
    pvd: PrimaryVolumeDescriptor,
}

impl<R: ReadSeek> Iso9660Reader<R> {
    /// Open an ISO9660 filesystem, parsing its Primary Volume Descriptor.
    pub fn open(mut reader: R) -> Result<Self, Iso9660Error> {
        let pvd = Self::read_pvd(&mut reader)?;
        Ok(Self { reader, pvd })
    }

    pub fn pvd(&self) -> &PrimaryVolumeDescriptor {
        &self.pvd
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    pub fn reader_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    fn read_sector(reader: &mut R, sector: u32) -> Result<[u8; SECTOR_SIZE as usize], Iso9660Error> {
        reader.seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE))?;
        let mut buf = [0u8; SECTOR_SIZE as usize];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn read_pvd(reader: &mut R) -> Result<PrimaryVolumeDescriptor, Iso9660Error> {
        let sector = Self::read_sector(reader, PVD_SECTOR)?;

        if sector[0] != 0x01 {
            return Err(Iso9660Error::InvalidPvd(format!(
                "expected PVD type 0x01, got 0x{:02X}",
                sector[0]
            )));
        }
        if &sector[1..6] != b"CD001" {
            return Err(Iso9660Error::InvalidPvd(
                "missing CD001 standard identifier".to_string(),
            ));
        }

        let system_identifier = ascii_field(&sector[8..40]);
        let volume_identifier = ascii_field(&sector[40..72]);
        let volume_space_size = u32::from_le_bytes(sector[80..84].try_into().unwrap());

        let root_record = parse_directory_record(&sector[156..190]).ok_or_else(|| {
            Iso9660Error::InvalidPvd("malformed root directory record".to_string())
        })?;

        Ok(PrimaryVolumeDescriptor {
            system_identifier,
            volume_identifier,
            volume_space_size,
            root_extent: root_record.extent,
        })
    }

    /// Read the raw bytes of a directory's contents (all its sectors,
    /// concatenated).
    fn read_directory_bytes(&mut self, extent: &Extent) -> Result<Vec<u8>, Iso9660Error> {
        let mut data = Vec::with_capacity(extent.byte_length as usize);
        for i in 0..extent.sector_count() {
            let sector = Self::read_sector(&mut self.reader, extent.start_sector + i)?;
            data.extend_from_slice(&sector);
        }
        data.truncate(extent.byte_length as usize);
        Ok(data)
    }

    /// Recursively enumerate every file and directory under the root,
    /// in directory-walk order (depth-first, as directory records appear
    /// on disc).
    pub fn walk(&mut self) -> Result<Vec<TreeEntry>, Iso9660Error> {
        let mut entries = Vec::new();
        let root = self.pvd.root_extent;
        self.walk_directory(&root, "", &mut entries)?;
        Ok(entries)
    }

    fn walk_directory(
        &mut self,
        extent: &Extent,
        prefix: &str,
        out: &mut Vec<TreeEntry>,
    ) -> Result<(), Iso9660Error> {
        let data = self.read_directory_bytes(extent)?;
        let mut pos = 0usize;
        // Collect subdirectories to recurse into after finishing this
        // directory's own listing, matching a straightforward depth-first
        // walk without holding the reader borrowed across recursion.
        let mut subdirs: Vec<(String, Extent)> = Vec::new();

        while pos < data.len() {
            let record_len = data[pos] as usize;
            if record_len == 0 {
                // Zero byte marks unused space to the end of this sector;
                // advance to the next sector boundary.
                let next_sector_boundary = (pos / SECTOR_SIZE as usize + 1) * SECTOR_SIZE as usize;
                if next_sector_boundary <= pos {
                    break;
                }
                pos = next_sector_boundary;
                continue;
            }
            if pos + record_len > data.len() {
                break;
            }

            if let Some(record) = parse_directory_record(&data[pos..pos + record_len]) {
                let stripped = strip_version(&record.identifier).to_uppercase();
                if stripped != "." && stripped != ".." {
                    let is_directory = record.file_flags & FLAG_DIRECTORY != 0;
                    let interleaved =
                        record.file_unit_size != 0 || record.interleave_gap_size != 0;
                    if interleaved {
                        log::warn!(
                            "{}{}: directory record declares interleaved extents, which this \
                             reader treats as a single contiguous run",
                            prefix,
                            stripped
                        );
                    }

                    let path = format!("{prefix}{stripped}");
                    if is_directory {
                        subdirs.push((path.clone(), record.extent));
                    }
                    out.push(TreeEntry {
                        path,
                        extent: record.extent,
                        is_directory,
                        interleaved,
                    });
                }
            }

            pos += record_len;
        }

        for (path, extent) in subdirs {
            self.walk_directory(&extent, &format!("{path}/"), out)?;
        }

        Ok(())
    }

    /// Resolve a `/`-separated path (case-insensitive) to its extent.
    pub fn find(&mut self, path: &str) -> Result<Option<Extent>, Iso9660Error> {
        let target = path.trim_start_matches('/').to_uppercase();
        let entries = self.walk()?;
        Ok(entries
            .into_iter()
            .find(|e| e.path.eq_ignore_ascii_case(&target))
            .map(|e| e.extent))
    }

    /// Read the full byte contents of a file at `path`.
    pub fn read_file(&mut self, path: &str) -> Result<Vec<u8>, Iso9660Error> {
        let extent = self
            .find(path)?
            .ok_or_else(|| Iso9660Error::NotFound(path.to_string()))?;
        let mut data = Vec::with_capacity(extent.byte_length as usize);
        for i in 0..extent.sector_count() {
            let sector = Self::read_sector(&mut self.reader, extent.start_sector + i)?;
            data.extend_from_slice(&sector);
        }
        data.truncate(extent.byte_length as usize);
        Ok(data)
    }

    /// Case-insensitive existence check for a directory path (used by the
    /// PIC synthesizer's hybrid-BD-Video `/BDMV` guard).
    pub fn has_directory(&mut self, path: &str) -> Result<bool, Iso9660Error> {
        let target = path.trim_start_matches('/').to_uppercase();
        let entries = self.walk()?;
        Ok(entries
            .iter()
            .any(|e| e.is_directory && e.path.eq_ignore_ascii_case(&target)))
    }
}

fn ascii_field(bytes: &[u8]) -> String {
    let s = std::str::from_utf8(bytes).unwrap_or("");
    s.trim_end().to_string()
}
