//! Index construction — one forward pass over the compressed stream.
//!
//! # What an entry must capture
//!
//! DEFLATE output at any point can reference the previous 32 KiB of output
//! and sits at an arbitrary bit position of the input, inside a block whose
//! Huffman tables were defined at the block's header.  An [`IndexPoint`]
//! therefore records the header's bit position (when one applies), the bit
//! position of the first payload code needed at the entry, and how much of
//! that code's expansion precedes the entry.  The whole uncompressed output
//! is retained alongside the points to reseed the window on resume.
//!
//! # Bit accounting
//!
//! The decoder reports, after every step, how many bits of the last consumed
//! input byte it has not used.  Combined with a running count of bytes
//! handed to it, this yields exact bit offsets:
//!
//! ```text
//! cursor_bits = (bytes_read - bytes_unconsumed) * 8 - unused_bits
//! ```
//!
//! The count of bytes handed over must therefore never run ahead of what the
//! arithmetic can see.  After a block header lands mid-byte, refills drop to
//! a single byte at a time until the consumed count realigns to a multiple
//! of eight; this is the one non-obvious discipline in the pass and it must
//! not be "optimized" back to full-buffer refills.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::inflate::{Inflater, Mark, Step};

/// Uncompressed bytes between consecutive index points when the caller does
/// not choose otherwise.  Smaller chunks give a denser index and finer
/// seeking at the cost of more entries.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Compressed-input refill buffer size for the indexing pass.
const INPUT_BUF: usize = 16384;

/// Initial history capacity; the buffer doubles as it grows.
const HISTORY_PREALLOC: usize = 128 * 1024;

/// Initial entry-list capacity; doubles as it grows.
const INDEX_PREALLOC: usize = 512;

/// Longest expansion a single DEFLATE code can produce.
pub const MAX_MATCH: u32 = 258;

// ── IndexPoint ───────────────────────────────────────────────────────────────

/// Resume descriptor for one chunk boundary of the uncompressed output.
///
/// Entry `k` of an index describes uncompressed offset `k * chunk_size`.
/// The `offset` field has a dual meaning governed by `head`:
///
/// | `head`    | `offset` | entry position                                     |
/// |-----------|----------|----------------------------------------------------|
/// | `None`    | `0`      | exactly at a block boundary; no pre-roll           |
/// | `None`    | `> 0`    | inside a stored block; raw bytes remaining in it   |
/// | `Some(_)` | any      | inside a coded block; output bytes of the code at `start` to decode and discard |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexPoint {
    /// Bit offset of the enclosing block's first header bit, or `None` when
    /// the entry sits at a block boundary or inside a stored block (stored
    /// blocks carry no Huffman trees to replay).
    pub head: Option<u64>,
    /// Bit offset of the first bit of compressed payload needed to produce
    /// output at or before the entry.  Inside a coded block this may name a
    /// code whose expansion straddles the entry; inside a stored block it
    /// names the next raw byte.
    pub start: u64,
    /// See the table above.  Never exceeds [`MAX_MATCH`] when `head` is set.
    pub offset: u32,
    /// The enclosing block carries the final-block flag.  Consulted only
    /// when a stored-block header is synthesized on resume.
    pub last: bool,
}

// ── DeflateIndex ─────────────────────────────────────────────────────────────

/// A complete random-access index over one raw DEFLATE stream, together with
/// the two parameters every resume needs.
///
/// Built once by [`DeflateIndex::build`], never mutated afterward.
#[derive(Debug, Clone)]
pub struct DeflateIndex {
    /// Byte offset in the input where the raw DEFLATE payload begins
    /// (typically the value returned by [`crate::gzip::deflate_start`]).
    pub base_offset: u64,
    /// Uncompressed bytes between consecutive entries.
    pub chunk_size: usize,
    /// Entry `k` resumes at uncompressed offset `k * chunk_size`.
    pub points: Vec<IndexPoint>,
}

impl DeflateIndex {
    /// Stream the raw DEFLATE payload once, recording an entry per
    /// `chunk_size` bytes of output.
    ///
    /// Returns the index and the complete uncompressed output; the latter
    /// both seeds dictionaries on resume and serves as the reference copy
    /// for verification.  A `chunk_size` of zero is treated as one.
    ///
    /// Exhausting the input while the decoder still wants bits is
    /// [`Error::UnexpectedEof`]; a malformed stream is [`Error::Data`].  No
    /// partial index is ever returned.
    pub fn build<R: Read + Seek>(
        input: &mut R,
        base_offset: u64,
        chunk_size: usize,
    ) -> Result<(DeflateIndex, Vec<u8>)> {
        let chunk_size = chunk_size.max(1);
        input.seek(SeekFrom::Start(base_offset))?;

        let mut codec = Inflater::raw()?;
        let mut points = Vec::with_capacity(INDEX_PREALLOC);
        let mut out: Vec<u8> = Vec::with_capacity(HISTORY_PREALLOC);

        // Entry 0: resume from scratch at the first bit.
        points.push(IndexPoint { head: None, start: 0, offset: 0, last: false });

        let mut inbuf = [0u8; INPUT_BUF];
        let mut in_pos = 0usize;
        let mut in_len = 0usize;
        let mut stride = INPUT_BUF;
        // Bytes handed to the refill buffer so far; the codec's exact bit
        // cursor is derived from this minus what it has not yet consumed.
        let mut pos: u64 = 0;
        // First header bit of the block most recently entered, and whether
        // the stream has reached the end of its final block.
        let mut head_bit: u64 = 0;
        let mut ended = false;

        loop {
            let chunk_base = out.len();
            out.resize(chunk_base + chunk_size, 0);
            let mut filled = 0usize;

            // Decode one chunk of output, stopping at every block boundary
            // to keep the header bookkeeping current.
            loop {
                if in_pos == in_len {
                    let n = match input.read(&mut inbuf[..stride]) {
                        Ok(n) => n,
                        Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => return Err(e.into()),
                    };
                    if n == 0 {
                        return Err(Error::UnexpectedEof);
                    }
                    pos += n as u64;
                    in_pos = 0;
                    in_len = n;
                }

                let (_, consumed, produced) = codec.step(
                    &inbuf[in_pos..in_len],
                    &mut out[chunk_base + filled..chunk_base + chunk_size],
                    Step::Block,
                )?;
                in_pos += consumed;
                filled += produced;

                if codec.at_block_boundary() {
                    let consumed_bytes = pos - (in_len - in_pos) as u64;
                    // A header that ends mid-byte leaves the bit cursor
                    // behind the byte count; single-byte refills until the
                    // count realigns keep the arithmetic above exact.
                    stride = if consumed_bytes % 8 != 0 { 1 } else { INPUT_BUF };
                    head_bit = consumed_bytes * 8 - u64::from(codec.unused_bits());
                    ended = codec.last_block();
                }

                if filled == chunk_size || ended {
                    break;
                }
            }

            if ended {
                out.truncate(chunk_base + filled);
                break;
            }

            // A full chunk was produced and more follows: record the resume
            // descriptor for the position just reached.
            let consumed_bytes = pos - (in_len - in_pos) as u64;
            let here = consumed_bytes * 8 - u64::from(codec.unused_bits());
            let last = codec.last_block();
            let point = match codec.mark() {
                Mark::Boundary => IndexPoint { head: None, start: here, offset: 0, last },
                Mark::Stored { remaining } => {
                    IndexPoint { head: None, start: here, offset: remaining, last }
                }
                Mark::Code { back, emitted } => IndexPoint {
                    head: Some(head_bit),
                    start: here - u64::from(back),
                    offset: emitted,
                    last,
                },
            };
            points.push(point);
        }

        Ok((DeflateIndex { base_offset, chunk_size, points }, out))
    }

    /// Number of entry points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Entry whose chunk contains the given uncompressed offset, clamped to
    /// the final entry.
    pub fn entry_for(&self, uncompressed_offset: u64) -> usize {
        let k = (uncompressed_offset / self.chunk_size as u64) as usize;
        k.min(self.points.len() - 1)
    }
}
