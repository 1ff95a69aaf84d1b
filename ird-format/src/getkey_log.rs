//! Parser for the text log an external PS3 dumping tool ("GetKey")
//! produces alongside a disc dump: the disc key, disc ID, and PIC all
//! live in this log rather than on the disc itself.

use crate::error::IrdError;
use crate::keys::DiscId;
use crate::keys::DiscKey;

/// Disc key, disc ID, and PIC extracted from a GetKey log.
#[derive(Debug, Clone)]
pub struct GetKeyLog {
    pub disc_key: DiscKey,
    pub disc_id: DiscId,
    pub pic: [u8; 115],
}

const PIC_HEX_LEN: usize = 230;
const PIC_BLOCK_TOTAL_HEX_LEN: usize = 256;
const PIC_BLOCK_LINES: usize = 8;

pub fn parse(text: &str) -> Result<GetKeyLog, IrdError> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim()).collect();

    if !lines
        .iter()
        .any(|l| l.starts_with("get_dec_key succeeded!"))
    {
        return Err(IrdError::malformed_log(
            "missing 'get_dec_key succeeded!' line",
        ));
    }

    let disc_key = parse_disc_key(&lines)?;
    let disc_id = parse_disc_id(&lines)?;
    let pic = parse_pic(&lines)?;

    let mut saw_success = false;
    for line in &lines {
        if line.starts_with("WARNING") && !saw_success {
            return Err(IrdError::malformed_log(format!(
                "WARNING encountered before SUCCESS: {line}"
            )));
        }
        if line.starts_with("SUCCESS") {
            saw_success = true;
            break;
        }
    }
    if !saw_success {
        return Err(IrdError::malformed_log("missing SUCCESS line"));
    }

    Ok(GetKeyLog {
        disc_key,
        disc_id,
        pic,
    })
}

fn parse_disc_key(lines: &[&str]) -> Result<DiscKey, IrdError> {
    let hex_value = find_assignment(lines, "disc_key")
        .ok_or_else(|| IrdError::malformed_log("missing 'disc_key =' line"))?;
    let bytes = decode_hex16(hex_value)
        .ok_or_else(|| IrdError::malformed_log("disc_key is not 32 hex characters"))?;
    Ok(DiscKey(bytes))
}

fn parse_disc_id(lines: &[&str]) -> Result<DiscId, IrdError> {
    let hex_value = find_assignment(lines, "disc_id")
        .ok_or_else(|| IrdError::malformed_log("missing 'disc_id =' line"))?;
    if hex_value.len() != 32 {
        return Err(IrdError::malformed_log(
            "disc_id is not 32 hex characters",
        ));
    }

    let (serial_prefix, trailing) = hex_value.split_at(24);
    if !trailing.eq_ignore_ascii_case("XXXXXXXX") {
        log::warn!(
            "disc_id trailing 8 hex chars were {trailing:?}, not the expected 'XXXXXXXX' mask"
        );
    }
    let normalized = format!("{serial_prefix}00000001");

    let bytes = decode_hex16(&normalized)
        .ok_or_else(|| IrdError::malformed_log("disc_id is not valid hex"))?;
    Ok(DiscId(bytes))
}

fn parse_pic(lines: &[&str]) -> Result<[u8; 115], IrdError> {
    let pic_line_idx = lines
        .iter()
        .position(|l| *l == "PIC:")
        .ok_or_else(|| IrdError::malformed_log("missing 'PIC:' line"))?;

    let block_lines = lines
        .get(pic_line_idx + 1..pic_line_idx + 1 + PIC_BLOCK_LINES)
        .ok_or_else(|| IrdError::malformed_log("PIC block is truncated"))?;

    let concatenated: String = block_lines.concat();
    if concatenated.len() != PIC_BLOCK_TOTAL_HEX_LEN {
        return Err(IrdError::malformed_log(format!(
            "PIC block hex length is {}, expected {}",
            concatenated.len(),
            PIC_BLOCK_TOTAL_HEX_LEN
        )));
    }

    let pic_hex = &concatenated[..PIC_HEX_LEN];
    let bytes = hex::decode(pic_hex)
        .map_err(|_| IrdError::malformed_log("PIC block is not valid hex"))?;

    let mut pic = [0u8; 115];
    pic.copy_from_slice(&bytes);
    Ok(pic)
}

fn find_assignment<'a>(lines: &[&'a str], key: &str) -> Option<&'a str> {
    let prefix = format!("{key} = ");
    for line in lines {
        if let Some(rest) = line.strip_prefix(&prefix) {
            return Some(rest.trim());
        }
        // Also accept the key appearing anywhere on the line, as the
        // tool's log format pads some lines with leading context.
        if let Some(idx) = line.find(&prefix) {
            return Some(line[idx + prefix.len()..].trim());
        }
    }
    None
}

fn decode_hex16(hex_str: &str) -> Option<[u8; 16]> {
    if hex_str.len() != 32 {
        return None;
    }
    let bytes = hex::decode(hex_str).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_log(disc_id_trailing: &str) -> String {
        let pic_line = "00".repeat(16);
        format!(
            "get_dec_key succeeded!\n\
             disc_key = 0123456789ABCDEF0123456789ABCDEF\n\
             disc_id = AAAAAAAAAAAAAAAAAAAAAAAA{disc_id_trailing}\n\
             PIC:\n\
             {pic_line}\n{pic_line}\n{pic_line}\n{pic_line}\n\
             {pic_line}\n{pic_line}\n{pic_line}\n{pic_line}\n\
             SUCCESS\n"
        )
    }

    #[test]
    fn parses_disc_key_disc_id_and_pic() {
        let log = sample_log("XXXXXXXX");
        let parsed = parse(&log).unwrap();
        assert_eq!(
            parsed.disc_key.0,
            [0x01, 0x23, 0x45, 0x67, 0x89, 0xAB, 0xCD, 0xEF, 0x01, 0x23, 0x45, 0x67, 0x89, 0xAB,
                0xCD, 0xEF]
        );
        assert_eq!(&parsed.disc_id.0[12..], &[0x00, 0x00, 0x00, 0x01]);
        assert_eq!(parsed.pic.len(), 115);
    }

    #[test]
    fn accepts_non_wildcard_trailing_disc_id_with_warning() {
        let log = sample_log("DEADBEEF");
        let parsed = parse(&log).unwrap();
        // Still normalized regardless of what the trailing chars were.
        assert_eq!(&parsed.disc_id.0[12..], &[0x00, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn missing_succeeded_line_is_malformed() {
        let log = sample_log("XXXXXXXX").replacen("get_dec_key succeeded!\n", "", 1);
        assert!(parse(&log).is_err());
    }

    #[test]
    fn warning_before_success_is_malformed() {
        let mut log = sample_log("XXXXXXXX");
        log = log.replacen("SUCCESS", "WARNING: disc read error\nSUCCESS", 1);
        assert!(parse(&log).is_err());
    }

    #[test]
    fn wrong_length_disc_key_is_malformed() {
        let log = sample_log("XXXXXXXX").replace(
            "disc_key = 0123456789ABCDEF0123456789ABCDEF",
            "disc_key = 0123",
        );
        assert!(parse(&log).is_err());
    }
}
