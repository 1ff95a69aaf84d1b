//! Streaming CRC-32 and MD5 contexts.
//!
//! Both types are cheap to construct and hold no shared state, so the
//! engine can keep dozens of them open concurrently (one per region, one
//! per file) and prune finished ones each buffer iteration.

/// Streaming CRC-32 (IEEE 802.3 polynomial), little-endian on finalize.
#[derive(Clone)]
pub struct StreamingCrc32 {
    hasher: crc32fast::Hasher,
}

impl StreamingCrc32 {
    pub fn new() -> Self {
        Self {
            hasher: crc32fast::Hasher::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.hasher.update(bytes);
    }

    /// Consume the context and return the checksum.
    pub fn finalize(self) -> u32 {
        self.hasher.finalize()
    }
}

impl Default for StreamingCrc32 {
    fn default() -> Self {
        Self::new()
    }
}

/// Streaming MD5.
#[derive(Clone)]
pub struct StreamingMd5 {
    ctx: md5::Context,
}

impl StreamingMd5 {
    pub fn new() -> Self {
        Self {
            ctx: md5::Context::new(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.ctx.consume(bytes);
    }

    /// Consume the context and return the 16-byte digest.
    pub fn finalize(self) -> [u8; 16] {
        self.ctx.compute().0
    }
}

impl Default for StreamingMd5 {
    fn default() -> Self {
        Self::new()
    }
}
