//! PIC (Physical Information Configuration) synthesis from an ISO's size
//! and, for dual-layer discs, its layerbreak.

use crate::error::IrdError;

/// Boundary between BD-25 (single-layer) and BD-50 (dual-layer) discs,
/// in bytes. A size exactly at this boundary is still BD-25.
pub const BD_LAYER_SIZE: u64 = 25_025_314_816;

const SECTOR_SIZE: u64 = 2048;

const PRELUDE: [u8; 24] = [
    0x10, 0x02, 0x00, 0x00, 0x44, 0x49, 0x01, 0x08, 0x00, 0x00, 0x20, 0x00, 0x42, 0x44, 0x4F, 0x01,
    0x11, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const PIC_LEN: usize = 115;
const EXACT_IRD_BYTE_OFFSET: usize = 114;
const EXACT_IRD_MARKER: u8 = 0x03;

/// BD-50's default layerbreak (in bytes) when none is supplied and the
/// disc is not a hybrid BD-Video disc.
const DEFAULT_LAYERBREAK_BYTES: u64 = BD_LAYER_SIZE;

const BD50_L0_START_SECTOR: u64 = 0x100000;
const BD50_SECTOR_CONSTANT: u64 = 32_505_854;

/// Synthesize a 115-byte PIC.
///
/// `has_bdmv` reports whether the ISO contains a `/BDMV` directory
/// (checked by the caller via `ird-iso9660`'s `has_directory`); it is
/// only consulted when `size` is BD-50-sized and `layerbreak` is `None`.
pub fn synthesize(
    size: u64,
    layerbreak: Option<u64>,
    exact_ird: bool,
    has_bdmv: bool,
) -> Result<[u8; PIC_LEN], IrdError> {
    if size == 0 || !size.is_multiple_of(SECTOR_SIZE) {
        return Err(IrdError::invalid_argument(
            "ISO size must be a positive multiple of 2048",
        ));
    }
    if let Some(lb) = layerbreak {
        if lb == 0 || lb >= size || !lb.is_multiple_of(SECTOR_SIZE) || lb >= 2 * BD_LAYER_SIZE {
            return Err(IrdError::invalid_argument(
                "layerbreak must be positive, less than the ISO size, a multiple of 2048, and \
                 less than 2x the BD-25 layer size",
            ));
        }
    }

    let mut pic = [0u8; PIC_LEN];

    if size <= BD_LAYER_SIZE {
        pic[..24].copy_from_slice(&PRELUDE);
        let total_sectors = size / SECTOR_SIZE + 1_048_575;
        pic[24..28].copy_from_slice(&(total_sectors as u32).to_be_bytes());
        pic[28..32].copy_from_slice(&0x0010_0000u32.to_be_bytes());
        let layer_end = size / SECTOR_SIZE + 1_048_574;
        pic[32..36].copy_from_slice(&(layer_end as u32).to_be_bytes());
        // remaining 79 bytes stay zero
    } else {
        let layerbreak = match layerbreak {
            Some(lb) => lb,
            None => {
                if has_bdmv {
                    return Err(IrdError::invalid_argument(
                        "BD-50 disc with a /BDMV directory requires an explicit layerbreak",
                    ));
                }
                DEFAULT_LAYERBREAK_BYTES
            }
        };

        let layerbreak_sectors = layerbreak / SECTOR_SIZE;
        let l0_start_sector = BD50_L0_START_SECTOR;
        let l0_end_sector = layerbreak_sectors + l0_start_sector - 2;
        let l1_start_sector = BD50_SECTOR_CONSTANT - layerbreak_sectors + 2;
        let total_sectors =
            size / SECTOR_SIZE + l0_start_sector + (l1_start_sector - l0_end_sector - 3);

        pic[..24].copy_from_slice(&PRELUDE);
        pic[24..28].copy_from_slice(&(total_sectors as u32).to_be_bytes());
        pic[28..32].copy_from_slice(&(l0_start_sector as u32).to_be_bytes());
        pic[32..36].copy_from_slice(&(l0_end_sector as u32).to_be_bytes());
        pic[36..40].copy_from_slice(&(l1_start_sector as u32).to_be_bytes());
        // remaining bytes stay zero
    }

    if exact_ird {
        pic[EXACT_IRD_BYTE_OFFSET] = EXACT_IRD_MARKER;
    }

    Ok(pic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bd25_exactly_at_boundary_uses_single_layer_branch() {
        let pic = synthesize(BD_LAYER_SIZE, None, false, false).unwrap();
        assert_eq!(&pic[..24], &PRELUDE);
        assert_eq!(&pic[36..], &[0u8; 79]);
    }

    #[test]
    fn bd25_total_sectors_and_layer_end() {
        let size = 4 * SECTOR_SIZE;
        let pic = synthesize(size, None, false, false).unwrap();
        let total_sectors = u32::from_be_bytes(pic[24..28].try_into().unwrap());
        let layer_end = u32::from_be_bytes(pic[32..36].try_into().unwrap());
        assert_eq!(total_sectors, 4 + 1_048_575);
        assert_eq!(layer_end, 4 + 1_048_574);
    }

    #[test]
    fn bd50_without_layerbreak_and_without_bdmv_uses_default() {
        let size = BD_LAYER_SIZE + SECTOR_SIZE;
        let pic = synthesize(size, None, false, false).unwrap();
        let l0_start = u32::from_be_bytes(pic[28..32].try_into().unwrap());
        assert_eq!(l0_start, 0x100000);
    }

    #[test]
    fn bd50_without_layerbreak_and_with_bdmv_is_invalid_argument() {
        let size = BD_LAYER_SIZE + SECTOR_SIZE;
        let result = synthesize(size, None, false, true);
        assert!(result.is_err());
    }

    #[test]
    fn exact_ird_overrides_byte_114() {
        let pic = synthesize(4 * SECTOR_SIZE, None, true, false).unwrap();
        assert_eq!(pic[114], 0x03);
    }

    #[test]
    fn rejects_size_not_multiple_of_sector() {
        assert!(synthesize(2049, None, false, false).is_err());
    }

    #[test]
    fn rejects_layerbreak_past_size() {
        let size = BD_LAYER_SIZE + SECTOR_SIZE;
        assert!(synthesize(size, Some(size), false, false).is_err());
    }

    #[test]
    fn rejects_unaligned_layerbreak() {
        let size = BD_LAYER_SIZE + SECTOR_SIZE;
        assert!(synthesize(size, Some(1025), false, false).is_err());
    }
}
