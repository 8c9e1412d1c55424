//! Crate-wide error taxonomy.
//!
//! Nothing here is recovered from locally: every failure unwinds to the
//! caller and releases the codec, the index, and the history buffer on the
//! way out.  An indexing run either returns a complete index or nothing.

use std::io;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A read or seek on the compressed input failed.  Surfaced verbatim.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The compressed stream is malformed, or an internal consistency check
    /// failed (e.g. a block header that never completed, or a pre-roll decode
    /// that produced fewer bytes than recorded).
    #[error("corrupt deflate stream: {0}")]
    Data(String),

    /// The decoder reported a memory failure.
    #[error("decoder out of memory")]
    Mem,

    /// The input ran dry during the indexing pass while the decoder still
    /// wanted bits.  Truncated files land here, never in `Data`.
    #[error("unexpected end of compressed input")]
    UnexpectedEof,

    /// A zero-length read while repositioning the input at an entry point.
    /// Distinct from [`Error::UnexpectedEof`]: repositioning reads already
    /// know where the data must be, so an empty read means the file shrank
    /// or the entry is stale, not that the stream was cut short mid-pass.
    #[error("no input available at entry point")]
    Starved,
}
