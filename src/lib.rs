//! # gzseek — random-access indexing for gzip (DEFLATE) streams
//!
//! Core guarantees:
//! - One forward pass over the compressed input produces the index and the
//!   complete uncompressed output; the compressed file is never modified
//! - Entry 0 always resumes from scratch; entry `k` resumes decoding at
//!   exactly `k × chunk_size` bytes of uncompressed output
//! - Resuming reads the shared history but never writes it, so entries can
//!   be replayed in any order against the same buffer
//! - DEFLATE is never reimplemented here: all decoding goes through the
//!   zlib capability adapter in [`inflate`]
//! - Indexing returns a complete index or an error, never a partial one
//! - One gzip member per file; the index lives in memory only

pub mod error;
pub mod inflate;
pub mod index;
pub mod seek;
pub mod gzip;
pub mod verify;

// Flat re-exports for the most common types.
pub use error::{Error, Result};
pub use gzip::deflate_start;
pub use index::{DeflateIndex, IndexPoint, DEFAULT_CHUNK_SIZE, MAX_MATCH};
pub use inflate::{Inflater, Mark, Status, Step};
pub use seek::{seek_entry, EntryReader};
pub use verify::verify_reverse;
