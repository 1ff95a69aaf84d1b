//! The on-disk IRD container: a gzip-wrapped, versioned, CRC-tailed byte
//! layout. See the field table this module implements for the exact
//! per-version placement rules.

use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use ird_core::util::{read_ascii_nul, write_ascii_padded};

use crate::error::IrdError;

const MAGIC: &[u8; 4] = b"3IRD";
const TITLE_ID_LEN: usize = 9;
const SYSTEM_VERSION_LEN: usize = 4;
const DISC_VERSION_LEN: usize = 5;
const APP_VERSION_LEN: usize = 5;
const PIC_LEN: usize = 115;
const KEY_LEN: usize = 16;

/// A fully-populated IRD record, ready to serialize or freshly parsed
/// from an on-disk container.
#[derive(Debug, Clone)]
pub struct IrdRecord {
    pub version: u8,
    pub title_id: String,
    pub title: String,
    pub system_version: String,
    pub disc_version: String,
    pub app_version: String,
    pub uid: u32,
    /// Gzip-compressed header bytes, stored verbatim.
    pub header: Vec<u8>,
    /// Gzip-compressed footer bytes, stored verbatim.
    pub footer: Vec<u8>,
    pub region_hashes: Vec<[u8; 16]>,
    /// `(FileKey, MD5)` pairs, sorted ascending by FileKey.
    pub file_entries: Vec<(i64, [u8; 16])>,
    pub extra_config: u16,
    pub attachments: u16,
    pub pic: [u8; PIC_LEN],
    pub data1_key: [u8; KEY_LEN],
    pub data2_key: [u8; KEY_LEN],
}

impl IrdRecord {
    fn has_uid_after_app_version(&self) -> bool {
        self.version == 7
    }

    fn has_uid_at_end(&self) -> bool {
        self.version > 7
    }

    fn pic_comes_before_keys(&self) -> bool {
        self.version >= 9
    }

    fn write_body(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(self.version);

        let mut title_id_field = [0u8; TITLE_ID_LEN];
        write_ascii_padded(&mut title_id_field, &self.title_id);
        buf.extend_from_slice(&title_id_field);

        write_varint_string(&mut buf, &self.title);

        let mut system_version_field = [0u8; SYSTEM_VERSION_LEN];
        write_ascii_padded(&mut system_version_field, &self.system_version);
        buf.extend_from_slice(&system_version_field);

        let mut disc_version_field = [0u8; DISC_VERSION_LEN];
        write_ascii_padded(&mut disc_version_field, &self.disc_version);
        buf.extend_from_slice(&disc_version_field);

        let mut app_version_field = [0u8; APP_VERSION_LEN];
        write_ascii_padded(&mut app_version_field, &self.app_version);
        buf.extend_from_slice(&app_version_field);

        if self.has_uid_after_app_version() {
            buf.extend_from_slice(&self.uid.to_le_bytes());
        }

        buf.extend_from_slice(&(self.header.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.header);

        buf.extend_from_slice(&(self.footer.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.footer);

        buf.push(self.region_hashes.len() as u8);
        for hash in &self.region_hashes {
            buf.extend_from_slice(hash);
        }

        buf.extend_from_slice(&(self.file_entries.len() as u32).to_le_bytes());
        for (file_key, md5) in &self.file_entries {
            buf.extend_from_slice(&file_key.to_le_bytes());
            buf.extend_from_slice(md5);
        }

        buf.extend_from_slice(&self.extra_config.to_le_bytes());
        buf.extend_from_slice(&self.attachments.to_le_bytes());

        if self.pic_comes_before_keys() {
            buf.extend_from_slice(&self.pic);
        }

        buf.extend_from_slice(&self.data1_key);
        buf.extend_from_slice(&self.data2_key);

        if !self.pic_comes_before_keys() {
            buf.extend_from_slice(&self.pic);
        }

        if self.has_uid_at_end() {
            buf.extend_from_slice(&self.uid.to_le_bytes());
        }

        buf
    }

    /// Serialize to the gzip-wrapped wire format.
    pub fn write(&self) -> Result<Vec<u8>, IrdError> {
        if !(6..=9).contains(&self.version) {
            return Err(IrdError::UnsupportedVersion(self.version));
        }

        let mut body = self.write_body();
        let crc = crc32fast::hash(&body);
        body.extend_from_slice(&crc.to_le_bytes());

        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&body)?;
        let compressed = encoder.finish()?;

        // Zero the gzip header's embedded mtime so two runs produce
        // byte-identical output regardless of wall-clock time.
        let mut out = compressed;
        if out.len() >= 8 {
            out[4..8].copy_from_slice(&[0, 0, 0, 0]);
        }
        Ok(out)
    }

    /// Serialize and atomically write to `path`: write to a scratch file
    /// beside the destination, then rename into place only on success.
    pub fn write_to_file(&self, path: &Path) -> Result<(), IrdError> {
        let bytes = self.write()?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut scratch = tempfile::NamedTempFile::new_in(dir)?;
        scratch.write_all(&bytes)?;
        scratch.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    /// Parse a gzip-wrapped IRD container.
    pub fn read(gzip_bytes: &[u8]) -> Result<Self, IrdError> {
        let mut decoder = GzDecoder::new(Cursor::new(gzip_bytes));
        let mut body = Vec::new();
        decoder.read_to_end(&mut body)?;

        if body.len() < 4 {
            return Err(IrdError::UnsupportedVersion(0));
        }
        let (payload, crc_bytes) = body.split_at(body.len() - 4);
        let stored_crc = u32::from_le_bytes(crc_bytes.try_into().unwrap());
        let computed_crc = crc32fast::hash(payload);
        if stored_crc != computed_crc {
            return Err(IrdError::ChecksumMismatch);
        }

        let mut cursor = Cursor::new(payload);
        let mut magic = [0u8; 4];
        read_exact(&mut cursor, &mut magic)?;
        if &magic != MAGIC {
            return Err(IrdError::invalid_iso("not an IRD container (bad magic)"));
        }

        let mut version_byte = [0u8; 1];
        read_exact(&mut cursor, &mut version_byte)?;
        let version = version_byte[0];
        if !(6..=9).contains(&version) {
            return Err(IrdError::UnsupportedVersion(version));
        }

        let mut title_id_field = [0u8; TITLE_ID_LEN];
        read_exact(&mut cursor, &mut title_id_field)?;
        let title_id = read_ascii_nul(&title_id_field);

        let title = read_varint_string(&mut cursor)?;

        let mut system_version_field = [0u8; SYSTEM_VERSION_LEN];
        read_exact(&mut cursor, &mut system_version_field)?;
        let system_version = read_ascii_nul(&system_version_field);

        let mut disc_version_field = [0u8; DISC_VERSION_LEN];
        read_exact(&mut cursor, &mut disc_version_field)?;
        let disc_version = read_ascii_nul(&disc_version_field);

        let mut app_version_field = [0u8; APP_VERSION_LEN];
        read_exact(&mut cursor, &mut app_version_field)?;
        let app_version = read_ascii_nul(&app_version_field);

        let mut uid = 0u32;
        if version == 7 {
            uid = read_u32_le(&mut cursor)?;
        }

        let header_len = read_u32_le(&mut cursor)? as usize;
        let mut header = vec![0u8; header_len];
        read_exact(&mut cursor, &mut header)?;

        let footer_len = read_u32_le(&mut cursor)? as usize;
        let mut footer = vec![0u8; footer_len];
        read_exact(&mut cursor, &mut footer)?;

        let mut region_count_byte = [0u8; 1];
        read_exact(&mut cursor, &mut region_count_byte)?;
        let region_count = region_count_byte[0] as usize;
        let mut region_hashes = Vec::with_capacity(region_count);
        for _ in 0..region_count {
            let mut hash = [0u8; 16];
            read_exact(&mut cursor, &mut hash)?;
            region_hashes.push(hash);
        }

        let file_count = read_u32_le(&mut cursor)? as usize;
        let mut file_entries = Vec::with_capacity(file_count);
        for _ in 0..file_count {
            let mut key_bytes = [0u8; 8];
            read_exact(&mut cursor, &mut key_bytes)?;
            let mut hash = [0u8; 16];
            read_exact(&mut cursor, &mut hash)?;
            file_entries.push((i64::from_le_bytes(key_bytes), hash));
        }

        let extra_config = read_u16_le(&mut cursor)?;
        let attachments = read_u16_le(&mut cursor)?;

        let mut pic = [0u8; PIC_LEN];
        if version >= 9 {
            read_exact(&mut cursor, &mut pic)?;
        }

        let mut data1_key = [0u8; KEY_LEN];
        read_exact(&mut cursor, &mut data1_key)?;
        let mut data2_key = [0u8; KEY_LEN];
        read_exact(&mut cursor, &mut data2_key)?;

        if version < 9 {
            read_exact(&mut cursor, &mut pic)?;
        }

        if version > 7 {
            uid = read_u32_le(&mut cursor)?;
        }

        Ok(IrdRecord {
            version,
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
            attachments,
            pic,
            data1_key,
            data2_key,
        })
    }
}

fn read_exact(cursor: &mut Cursor<&[u8]>, buf: &mut [u8]) -> Result<(), IrdError> {
    cursor
        .read_exact(buf)
        .map_err(|_| IrdError::invalid_iso("truncated IRD container"))
}

fn read_u32_le(cursor: &mut Cursor<&[u8]>) -> Result<u32, IrdError> {
    let mut bytes = [0u8; 4];
    read_exact(cursor, &mut bytes)?;
    Ok(u32::from_le_bytes(bytes))
}

fn read_u16_le(cursor: &mut Cursor<&[u8]>) -> Result<u16, IrdError> {
    let mut bytes = [0u8; 2];
    read_exact(cursor, &mut bytes)?;
    Ok(u16::from_le_bytes(bytes))
}

/// Write `value` using the 7-bit continuation length prefix (the same
/// shape as .NET's `BinaryWriter.Write(string)`), followed by its UTF-8
/// bytes.
fn write_varint_string(buf: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let mut len = bytes.len() as u32;
    loop {
        let mut byte = (len & 0x7F) as u8;
        len >>= 7;
        if len != 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if len == 0 {
            break;
        }
    }
    buf.extend_from_slice(bytes);
}

fn read_varint_string(cursor: &mut Cursor<&[u8]>) -> Result<String, IrdError> {
    let mut len: u32 = 0;
    let mut shift = 0u32;
    loop {
        let mut byte = [0u8; 1];
        read_exact(cursor, &mut byte)?;
        len |= ((byte[0] & 0x7F) as u32) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
        if shift >= 35 {
            return Err(IrdError::invalid_iso("Title length prefix is malformed"));
        }
    }
    let mut bytes = vec![0u8; len as usize];
    read_exact(cursor, &mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
