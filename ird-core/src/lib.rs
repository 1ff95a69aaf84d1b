//! Shared primitives for the IRD toolkit: AES-128-CBC block crypto,
//! streaming CRC-32/MD5, a status-callback progress type, and small
//! byte/string helpers reused by the ISO9660 reader and the IRD engine.

pub mod checksum;
pub mod crypto;
pub mod progress;
pub mod util;

use std::io::{Read, Seek};

pub use checksum::{StreamingCrc32, StreamingMd5};
pub use progress::StatusUpdate;

/// A reader that implements both `Read` and `Seek`, used throughout the
/// toolkit in place of a concrete `File` so callers can test against
/// `std::io::Cursor` buffers.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}
