//! `PS3_DISC.SFB` decoder: a flat key/value table describing a disc's
//! basic identity (title ID, disc type, version) read straight off the
//! ISO9660 file stream.

use std::io::{Read, Seek, SeekFrom};

use ird_core::util::read_ascii_nul;

use crate::error::IrdError;

const MAGIC: &[u8; 4] = b".SFB";
const ENTRY_TABLE_OFFSET: u64 = 0x20;
const ENTRY_SIZE: usize = 32;
const KEY_SIZE: usize = 16;

/// A decoded `PS3_DISC.SFB`: an ordered list of key/value pairs.
///
/// Kept as a `Vec` rather than a map so iteration order (and thus e.g.
/// `ird info --all` output) matches the order entries appeared on disc.
#[derive(Debug, Clone, Default)]
pub struct DiscSfb {
    entries: Vec<(String, String)>,
}

impl DiscSfb {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    /// Parse a `PS3_DISC.SFB` stream.
    pub fn parse<R: Read + Seek>(mut reader: R) -> Result<Self, IrdError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IrdError::malformed_metadata(
                "PS3_DISC.SFB: bad magic".to_string(),
            ));
        }

        let mut version_bytes = [0u8; 2];
        reader.read_exact(&mut version_bytes)?;
        let _version = u16::from_be_bytes(version_bytes);

        reader.seek(SeekFrom::Start(ENTRY_TABLE_OFFSET))?;

        let mut entries = Vec::new();
        loop {
            let mut raw = [0u8; ENTRY_SIZE];
            reader.read_exact(&mut raw)?;

            let key_bytes = &raw[..KEY_SIZE];
            if key_bytes.iter().all(|&b| b == 0) {
                break;
            }
            let key = read_ascii_nul(key_bytes);

            let value_offset = u32::from_be_bytes(raw[16..20].try_into().unwrap());
            let value_length = u32::from_be_bytes(raw[20..24].try_into().unwrap());

            let next_entry_pos = reader.stream_position()?;

            reader.seek(SeekFrom::Start(value_offset as u64))?;
            let mut value_bytes = vec![0u8; value_length as usize];
            reader.read_exact(&mut value_bytes)?;
            let value = read_ascii_nul(&value_bytes);

            entries.push((key, value));

            reader.seek(SeekFrom::Start(next_entry_pos))?;
        }

        Ok(DiscSfb { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_sfb(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.resize(ENTRY_TABLE_OFFSET as usize, 0);

        let table_len = (entries.len() + 1) * ENTRY_SIZE;
        let mut value_cursor = ENTRY_TABLE_OFFSET as usize + table_len;
        let mut values = Vec::new();

        for (key, value) in entries {
            let mut key_field = [0u8; KEY_SIZE];
            let kb = key.as_bytes();
            key_field[..kb.len()].copy_from_slice(kb);

            let value_bytes = value.as_bytes();
            buf.extend_from_slice(&key_field);
            buf.extend_from_slice(&(value_cursor as u32).to_be_bytes());
            buf.extend_from_slice(&(value_bytes.len() as u32).to_be_bytes());

            values.push(value_bytes.to_vec());
            value_cursor += value_bytes.len();
        }
        // terminator entry: all-zero key
        buf.extend_from_slice(&[0u8; ENTRY_SIZE]);

        for v in values {
            buf.extend_from_slice(&v);
        }

        buf
    }

    #[test]
    fn parses_entries_in_order() {
        let data = build_sfb(&[("TITLE_ID", "BLES00001"), ("VERSION", "01.00")]);
        let sfb = DiscSfb::parse(Cursor::new(data)).unwrap();
        assert_eq!(
            sfb.entries(),
            &[
                ("TITLE_ID".to_string(), "BLES00001".to_string()),
                ("VERSION".to_string(), "01.00".to_string()),
            ]
        );
        assert_eq!(sfb.get("VERSION"), Some("01.00"));
        assert_eq!(sfb.get("MISSING"), None);
    }

    #[test]
    fn rejects_bad_magic() {
        let data = b"NOPE".to_vec();
        assert!(DiscSfb::parse(Cursor::new(data)).is_err());
    }

    #[test]
    fn empty_table_yields_no_entries() {
        let data = build_sfb(&[]);
        let sfb = DiscSfb::parse(Cursor::new(data)).unwrap();
        assert!(sfb.entries().is_empty());
    }
}
