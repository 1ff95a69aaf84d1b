//! `PARAM.SFO` decoder: the PS3's general-purpose parameter table, used
//! here to recover `TITLE_ID`, `TITLE`, `APP_VER`, and similar fields.

use std::io::{Read, Seek, SeekFrom};

use ird_core::util::read_ascii_nul;

use crate::error::IrdError;

const MAGIC: &[u8; 4] = b"\0PSF";

const FMT_UTF8_RAW: u16 = 0x0004;
const FMT_UTF8_NUL: u16 = 0x0204;
const FMT_U32: u16 = 0x0404;

struct ParamDescriptor {
    key_offset: u16,
    data_format: u16,
    data_length: u32,
    data_offset: u32,
}

/// A decoded `PARAM.SFO`, preserving parameter declaration order.
#[derive(Debug, Clone, Default)]
pub struct ParamSfo {
    entries: Vec<(String, String)>,
}

impl ParamSfo {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn parse<R: Read + Seek>(mut reader: R) -> Result<Self, IrdError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(IrdError::malformed_metadata(
                "PARAM.SFO: bad magic".to_string(),
            ));
        }

        let mut header_rest = [0u8; 16];
        reader.read_exact(&mut header_rest)?;
        let _version = u32::from_le_bytes(header_rest[0..4].try_into().unwrap());
        let key_table_offset = u32::from_le_bytes(header_rest[4..8].try_into().unwrap());
        let data_table_offset = u32::from_le_bytes(header_rest[8..12].try_into().unwrap());
        let param_count = u32::from_le_bytes(header_rest[12..16].try_into().unwrap());

        let mut descriptors = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            let mut raw = [0u8; 16];
            reader.read_exact(&mut raw)?;
            descriptors.push(ParamDescriptor {
                key_offset: u16::from_le_bytes(raw[0..2].try_into().unwrap()),
                data_format: u16::from_le_bytes(raw[2..4].try_into().unwrap()),
                data_length: u32::from_le_bytes(raw[4..8].try_into().unwrap()),
                data_offset: u32::from_le_bytes(raw[12..16].try_into().unwrap()),
            });
        }

        let mut entries = Vec::with_capacity(descriptors.len());
        for desc in &descriptors {
            reader.seek(SeekFrom::Start(
                key_table_offset as u64 + desc.key_offset as u64,
            ))?;
            let key = read_nul_terminated(&mut reader)?;

            reader.seek(SeekFrom::Start(
                data_table_offset as u64 + desc.data_offset as u64,
            ))?;
            let mut data = vec![0u8; desc.data_length as usize];
            reader.read_exact(&mut data)?;

            let value = match desc.data_format {
                FMT_UTF8_RAW => String::from_utf8_lossy(&data).into_owned(),
                FMT_UTF8_NUL => read_ascii_nul(&data),
                FMT_U32 => {
                    let mut buf = [0u8; 4];
                    let n = data.len().min(4);
                    buf[..n].copy_from_slice(&data[..n]);
                    u32::from_le_bytes(buf).to_string()
                }
                _ => read_ascii_nul(&data),
            };

            entries.push((key, value));
        }

        Ok(ParamSfo { entries })
    }
}

fn read_nul_terminated<R: Read>(reader: &mut R) -> Result<String, IrdError> {
    let mut bytes = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_sfo(entries: &[(&str, u16, Vec<u8>)]) -> Vec<u8> {
        let mut key_table = Vec::new();
        let mut key_offsets = Vec::new();
        for (key, _, _) in entries {
            key_offsets.push(key_table.len() as u16);
            key_table.extend_from_slice(key.as_bytes());
            key_table.push(0);
        }
        while key_table.len() % 4 != 0 {
            key_table.push(0);
        }

        let mut data_table = Vec::new();
        let mut data_offsets = Vec::new();
        for (_, _, data) in entries {
            data_offsets.push(data_table.len() as u32);
            data_table.extend_from_slice(data);
        }

        let header_len = 20u32;
        let descriptors_len = (entries.len() as u32) * 16;
        let key_table_offset = header_len + descriptors_len;
        let data_table_offset = key_table_offset + key_table.len() as u32;

        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&key_table_offset.to_le_bytes());
        buf.extend_from_slice(&data_table_offset.to_le_bytes());
        buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());

        for (i, (_, fmt, data)) in entries.iter().enumerate() {
            buf.extend_from_slice(&key_offsets[i].to_le_bytes());
            buf.extend_from_slice(&fmt.to_le_bytes());
            buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            buf.extend_from_slice(&data_offsets[i].to_le_bytes());
        }

        buf.extend_from_slice(&key_table);
        buf.extend_from_slice(&data_table);
        buf
    }

    #[test]
    fn decodes_nul_trimmed_string() {
        let mut data = b"BLES00001".to_vec();
        data.push(0);
        let buf = build_sfo(&[("TITLE_ID", FMT_UTF8_NUL, data)]);
        let sfo = ParamSfo::parse(Cursor::new(buf)).unwrap();
        assert_eq!(sfo.get("TITLE_ID"), Some("BLES00001"));
    }

    #[test]
    fn decodes_raw_utf8_string() {
        let buf = build_sfo(&[("TITLE", FMT_UTF8_RAW, b"Some Game".to_vec())]);
        let sfo = ParamSfo::parse(Cursor::new(buf)).unwrap();
        assert_eq!(sfo.get("TITLE"), Some("Some Game"));
    }

    #[test]
    fn decodes_u32_as_decimal_string() {
        let buf = build_sfo(&[("PARENTAL_LEVEL", FMT_U32, 7u32.to_le_bytes().to_vec())]);
        let sfo = ParamSfo::parse(Cursor::new(buf)).unwrap();
        assert_eq!(sfo.get("PARENTAL_LEVEL"), Some("7"));
    }

    #[test]
    fn preserves_declaration_order() {
        let buf = build_sfo(&[
            ("B_KEY", FMT_UTF8_RAW, b"second".to_vec()),
            ("A_KEY", FMT_UTF8_RAW, b"first".to_vec()),
        ]);
        let sfo = ParamSfo::parse(Cursor::new(buf)).unwrap();
        let keys: Vec<&str> = sfo.entries().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["B_KEY", "A_KEY"]);
    }

    #[test]
    fn rejects_bad_magic() {
        assert!(ParamSfo::parse(Cursor::new(b"NOPE".to_vec())).is_err());
    }
}
