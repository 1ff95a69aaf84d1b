//! AES-128-CBC block crypto with an explicit IV and no padding.
//!
//! The IRD format never encrypts/decrypts more than one 16-byte block
//! through a single call site (disc sectors are chunked by the caller),
//! so the API here works directly on `&mut [u8; 16]` rather than
//! streaming over an internal buffer.

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::NoPadding};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Encrypt a single 16-byte block in place with AES-128-CBC, padding disabled.
pub fn encrypt_block(key: &[u8; 16], iv: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    cipher
        .encrypt_padded_mut::<NoPadding>(block, 16)
        .expect("single 16-byte block always fits its own buffer");
}

/// Decrypt a single 16-byte block in place with AES-128-CBC, padding disabled.
pub fn decrypt_block(key: &[u8; 16], iv: &[u8; 16], block: &mut [u8; 16]) {
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    cipher
        .decrypt_padded_mut::<NoPadding>(block)
        .expect("single 16-byte block always fits its own buffer");
}

/// Encrypt `data` (length a multiple of 16) in place under CBC, one block at
/// a time, using a single running IV (standard CBC chaining across blocks).
pub fn encrypt_blocks(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    debug_assert_eq!(data.len() % 16, 0);
    let cipher = Aes128CbcEnc::new(key.into(), iv.into());
    cipher
        .encrypt_padded_mut::<NoPadding>(data, data.len())
        .expect("data length is a multiple of the block size");
}

/// Decrypt `data` (length a multiple of 16) in place under CBC, one block at
/// a time, using a single running IV.
pub fn decrypt_blocks(key: &[u8; 16], iv: &[u8; 16], data: &mut [u8]) {
    debug_assert_eq!(data.len() % 16, 0);
    let cipher = Aes128CbcDec::new(key.into(), iv.into());
    cipher
        .decrypt_padded_mut::<NoPadding>(data)
        .expect("data length is a multiple of the block size");
}

/// Build the per-sector CBC initialization vector: the sector's global LBA
/// as a big-endian 32-bit integer, right-justified in 16 bytes with the
/// upper 96 bits zeroed (spec §6.3).
pub fn sector_iv(sector_lba: u32) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[12..16].copy_from_slice(&sector_lba.to_be_bytes());
    iv
}
