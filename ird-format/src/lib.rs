//! IRD (ISO Rebuild Data) generation and parsing.
//!
//! Composes the PARAM.SFO / PS3_DISC.SFB metadata decoders, the Data1/Data2
//! key schedule, the GetKey-log parser, the PIC synthesizer, the streaming
//! IRD engine, and the gzip-wrapped IRD container codec on top of
//! `ird-core`'s crypto primitives and `ird-iso9660`'s filesystem reader.

pub mod container;
pub mod engine;
pub mod error;
pub mod getkey_log;
pub mod keys;
pub mod pic;
pub mod sfb;
pub mod sfo;

pub use container::IrdRecord;
pub use engine::{EngineOptions, KeySource, generate_ird};
pub use error::IrdError;
pub use keys::{Bd25Region, Data1Key, Data2Key, DiscId, DiscKey};
