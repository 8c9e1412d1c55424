//! Resuming decompression at an index entry.
//!
//! [`seek_entry`] rebuilds decoder state for one [`IndexPoint`] in three
//! steps: reset, reseed the sliding window from the uncompressed history,
//! then reposition input and decoder by entry case:
//!
//! - **block boundary**: seek to the byte containing `start` and prime the
//!   decoder with that byte's residual bits;
//! - **inside a stored block**: feed a synthesized stored-block header
//!   claiming the bytes remaining, then seek to the next raw byte (stored
//!   blocks have no Huffman state to rebuild);
//! - **inside a coded block**: replay the block header in tree-stepping
//!   mode so the decoder rebuilds its tables, prime at `start`, then decode
//!   and discard the part of the straddling code that precedes the entry.
//!
//! Two bit positions are involved because a coded entry needs both: `head`
//! isolates the Huffman-tree bits, `start` the data code that produces the
//! target byte.  After a successful return the decoder holds no buffered
//! input or output; [`EntryReader`] supplies the ongoing decode loop.
//!
//! [`IndexPoint`]: crate::index::IndexPoint

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::index::{DeflateIndex, MAX_MATCH};
use crate::inflate::{Inflater, Status, Step};

/// Sliding-window span a resume may depend on.
const WINDOW_SIZE: usize = 32768;

/// No DEFLATE block header, dynamic tables included, spans this many bytes.
const MAX_HEADER_SPAN: usize = 289;

/// Compressed bytes sufficient to finish one partially decoded code (a
/// length/distance pair occupies at most 48 bits).
const PREROLL_BYTES: usize = 6;

/// Post-resume input refill size.
const REFILL: usize = 512;

/// Reposition `codec` and `input` so that decoding continues at uncompressed
/// offset `entry * index.chunk_size`.
///
/// `history` must hold at least the uncompressed output up to that offset
/// (normally the buffer returned by [`DeflateIndex::build`]).  It is only
/// read; resuming never touches bytes past the entry's edge, so entries can
/// be replayed in any order against the same buffer.
///
/// On success the codec is mid-stream with empty buffers; hand it to
/// [`EntryReader`] (or drive [`Inflater::step`] directly) to produce output.
///
/// # Panics
///
/// If `entry` is not a valid index into `index.points`.
pub fn seek_entry<R: Read + Seek>(
    codec: &mut Inflater,
    input: &mut R,
    index: &DeflateIndex,
    entry: usize,
    history: &[u8],
) -> Result<()> {
    let point = index.points[entry];
    codec.reset()?;

    // Seed the window with history up to the entry's edge.  For coded
    // entries the edge backs up over the pre-roll: those bytes re-enter the
    // window by being decoded again, not by being preloaded.
    let mut edge = entry * index.chunk_size;
    if point.head.is_some() {
        edge = edge
            .checked_sub(point.offset as usize)
            .ok_or_else(|| Error::Data("pre-roll larger than entry offset".into()))?;
    }
    let dict = edge.min(WINDOW_SIZE);
    codec.set_dictionary(&history[edge - dict..edge])?;

    match point.head {
        None if point.offset == 0 => {
            prime_at(codec, input, index.base_offset, point.start)?;
        }
        None => {
            // A stored block looks the same to the decoder whether its
            // header claims the block's full length or only what remains,
            // so synthesize one claiming the remainder.
            let len = point.offset as u16;
            let header = [
                point.last as u8,
                len as u8,
                (len >> 8) as u8,
                !len as u8,
                !(len >> 8) as u8,
            ];
            codec.step(&header, &mut [], Step::NoFlush)?;
            input.seek(SeekFrom::Start(index.base_offset + (point.start >> 3)))?;
        }
        Some(head) => {
            // Replay the block header so the decoder rebuilds its tables.
            input.seek(SeekFrom::Start(index.base_offset + (head >> 3)))?;
            let mut buf = [0u8; MAX_HEADER_SPAN];
            let n = read_full(input, &mut buf)?;
            if n == 0 {
                return Err(Error::Starved);
            }
            let shift = (head & 7) as u32;
            codec.prime(8 - shift, u32::from(buf[0] >> shift))?;
            codec.step(&buf[1..n], &mut [], Step::Trees)?;
            if !codec.header_done() {
                return Err(Error::Data("block header did not complete".into()));
            }
            codec.discard_bits()?;

            // Jump to the code whose expansion covers the entry.
            prime_at(codec, input, index.base_offset, point.start)?;

            if point.offset > 0 {
                // Decode and drop the part of that code preceding the
                // entry, then rewind the input the decoder did not need.
                let n = read_full(input, &mut buf[..PREROLL_BYTES])?;
                let mut discard = [0u8; MAX_MATCH as usize];
                let (_, consumed, produced) =
                    codec.step(&buf[..n], &mut discard[..point.offset as usize], Step::NoFlush)?;
                if produced != point.offset as usize {
                    return Err(Error::Data("pre-roll output missing at entry".into()));
                }
                input.seek(SeekFrom::Current(-((n - consumed) as i64)))?;
            }
        }
    }
    Ok(())
}

/// Seek to the byte containing `bit` and prime the decoder with that byte's
/// bits from `bit` onward.
fn prime_at<R: Read + Seek>(codec: &mut Inflater, input: &mut R, base: u64, bit: u64) -> Result<()> {
    input.seek(SeekFrom::Start(base + (bit >> 3)))?;
    let mut byte = [0u8; 1];
    if read_full(input, &mut byte)? == 0 {
        return Err(Error::Starved);
    }
    let shift = (bit & 7) as u32;
    codec.prime(8 - shift, u32::from(byte[0] >> shift))
}

/// Fill `buf` from `input`, stopping early only at end of input.
pub(crate) fn read_full<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

// ── EntryReader ──────────────────────────────────────────────────────────────

/// Streaming decode loop over a freshly resumed decoder.
///
/// Owns the input refill buffer so unconsumed compressed bytes survive
/// across [`EntryReader::read_into`] calls; create one per resume.
pub struct EntryReader<'a, R> {
    codec: &'a mut Inflater,
    input: &'a mut R,
    buf: [u8; REFILL],
    pos: usize,
    len: usize,
    eof: bool,
    done: bool,
}

impl<'a, R: Read> EntryReader<'a, R> {
    pub fn new(codec: &'a mut Inflater, input: &'a mut R) -> Self {
        EntryReader {
            codec,
            input,
            buf: [0u8; REFILL],
            pos: 0,
            len: 0,
            eof: false,
            done: false,
        }
    }

    /// Decode into `out` until it is full or the stream ends.  Returns the
    /// number of bytes produced; a short count means end of stream (see
    /// [`EntryReader::finished`]) or an input that ran dry early.
    pub fn read_into(&mut self, out: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < out.len() && !self.done {
            if self.pos == self.len && !self.eof {
                let n = match self.input.read(&mut self.buf) {
                    Ok(n) => n,
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                };
                self.pos = 0;
                self.len = n;
                self.eof = n == 0;
            }
            let (status, consumed, produced) =
                self.codec
                    .step(&self.buf[self.pos..self.len], &mut out[filled..], Step::NoFlush)?;
            self.pos += consumed;
            filled += produced;
            match status {
                Status::StreamEnd => self.done = true,
                Status::BufError if self.eof && produced == 0 => break,
                _ => {}
            }
        }
        Ok(filled)
    }

    /// The decoder reached the end of the DEFLATE stream.
    pub fn finished(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::DeflateIndex;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn entry_zero_resumes_from_scratch() {
        let data = b"resume from the very beginning".repeat(30);
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&data).unwrap();
        let compressed = enc.finish().unwrap();

        let mut cursor = Cursor::new(&compressed);
        let (index, history) = DeflateIndex::build(&mut cursor, 0, 1 << 20).unwrap();
        assert_eq!(index.len(), 1);

        let mut codec = Inflater::raw().unwrap();
        seek_entry(&mut codec, &mut cursor, &index, 0, &history).unwrap();

        let mut out = vec![0u8; data.len()];
        let mut reader = EntryReader::new(&mut codec, &mut cursor);
        let n = reader.read_into(&mut out).unwrap();
        assert_eq!(n, data.len());
        assert_eq!(out, data);
    }
}
