/// Status updates emitted by the IRD engine over an optional channel.
///
/// This is the "status callback" the spec allows in place of a full
/// progress UI: the engine only ever produces these, never renders them.
/// A CLI or GUI front end is free to turn them into a progress bar,
/// a log line, or nothing at all.
#[derive(Debug, Clone)]
pub enum StatusUpdate {
    /// Extent discovery (metadata reads, region/file table construction)
    /// has started.
    DiscoveringExtents,

    /// The streaming pass has advanced to `sector` out of `total_sectors`.
    StreamingProgress { sector: u64, total_sectors: u64 },

    /// A non-fatal condition worth surfacing to the user (maps to the
    /// `ShortRead`-class warnings described in spec §4.7.4/§7).
    Warning(String),

    /// The header/footer gzip capture has completed.
    HeaderFooterCaptured,

    /// The IRD container is being serialized to disk.
    Writing,

    /// Generation finished successfully.
    Done,
}
