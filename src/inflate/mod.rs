//! Raw inflate capability layer over zlib.
//!
//! # Why zlib, and why these hooks
//!
//! Random access into a DEFLATE stream needs more than a decompressor: it
//! needs the decoder's bit-level controls.  [`Inflater`] wraps a raw zlib
//! `z_stream` and exposes exactly the capability set the indexer and resumer
//! drive:
//!
//!   - *raw mode*: headerless DEFLATE (`window_bits = -15`), plus an
//!     auto-detecting mode for skipping gzip/zlib wrappers;
//!   - *reset*: clear state between runs without reallocating;
//!   - *set_dictionary*: preload up to 32 KiB of sliding-window history;
//!   - *prime / discard_bits*: start decoding mid-byte;
//!   - *stepped decode*: [`Step::Block`] stops at block boundaries,
//!     [`Step::Trees`] stops after a block header, [`Step::NoFlush`] fills
//!     the output;
//!   - *bit accounting*: unused bits of the last consumed byte, plus the
//!     boundary / header-complete / final-block flags;
//!   - *mark*: where the code currently being decoded began, unpacked into
//!     [`Mark`].
//!
//! # Buffer discipline
//!
//! Input and output are plain slices passed per call; the wrapper reports
//! `(status, consumed, produced)` and never holds pointers into caller
//! memory across calls.  Callers keep their own cursor over unconsumed
//! input.

use std::ffi::CStr;
use std::mem;
use std::ptr;

use libc::{c_int, c_uint};
use libz_sys as ffi;

use crate::error::{Error, Result};

// ── zlib allocator callbacks ─────────────────────────────────────────────────
//
// `z_stream.zalloc`/`zfree` are bare function pointers, so real callbacks
// must be supplied rather than zeroed memory.

extern "C" fn zalloc(_opaque: ffi::voidpf, items: ffi::uInt, size: ffi::uInt) -> ffi::voidpf {
    match (items as usize).checked_mul(size as usize) {
        Some(len) => unsafe { libc::malloc(len) as ffi::voidpf },
        None => ptr::null_mut(),
    }
}

extern "C" fn zfree(_opaque: ffi::voidpf, address: ffi::voidpf) {
    unsafe { libc::free(address as *mut libc::c_void) }
}

// ── Step / Status / Mark ─────────────────────────────────────────────────────

/// How far a [`Inflater::step`] call is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Decode until the output slice is full or the stream ends.
    NoFlush = ffi::Z_NO_FLUSH as isize,
    /// Additionally return at every DEFLATE block boundary.
    Block = ffi::Z_BLOCK as isize,
    /// Additionally return once the current block's header (and Huffman
    /// trees, for coded blocks) has been consumed, before any block data.
    Trees = ffi::Z_TREES as isize,
}

/// Non-error outcomes of a [`Inflater::step`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Progress was made; call again with more input or output space.
    Ok,
    /// The end of the DEFLATE stream was reached.
    StreamEnd,
    /// No forward progress was possible with the buffers given.
    BufError,
}

/// Position of the decoder relative to the code it is currently expanding.
///
/// Obtained from [`Inflater::mark`] when an index entry is recorded; governs
/// which of the three resume protocols applies at that entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Exactly between two blocks (or still inside a block header).  Resume
    /// needs no pre-roll and no tree replay.
    Boundary,
    /// Mid-copy inside a stored block; `remaining` raw bytes are left in the
    /// block.  Resume synthesizes a fresh stored-block header.
    Stored { remaining: u32 },
    /// Inside a coded block: the current code began `back` bits behind the
    /// input cursor and has already emitted `emitted` output bytes.
    Code { back: u32, emitted: u32 },
}

// ── Inflater ─────────────────────────────────────────────────────────────────

/// A raw zlib inflate stream with the bit-level hooks needed for indexed
/// resume.  Reused across runs via [`Inflater::reset`]; the underlying state
/// is released on drop.
pub struct Inflater {
    // Boxed: zlib's internal state points back at the z_stream, so the
    // struct must not move after init.
    strm: Box<ffi::z_stream>,
}

impl Inflater {
    /// Decoder for a headerless (raw) DEFLATE stream.
    pub fn raw() -> Result<Self> {
        Self::with_window_bits(-15)
    }

    /// Decoder that auto-detects and consumes a gzip or zlib wrapper before
    /// the DEFLATE payload.  Used only to locate where the payload begins.
    pub fn auto() -> Result<Self> {
        Self::with_window_bits(15 + 32)
    }

    fn with_window_bits(bits: c_int) -> Result<Self> {
        let mut strm = Box::new(ffi::z_stream {
            next_in: ptr::null_mut(),
            avail_in: 0,
            total_in: 0,
            next_out: ptr::null_mut(),
            avail_out: 0,
            total_out: 0,
            msg: ptr::null_mut(),
            state: ptr::null_mut(),
            zalloc,
            zfree,
            opaque: ptr::null_mut(),
            data_type: 0,
            adler: 0,
            reserved: 0,
        });
        let rc = unsafe {
            ffi::inflateInit2_(
                &mut *strm,
                bits,
                ffi::zlibVersion(),
                mem::size_of::<ffi::z_stream>() as c_int,
            )
        };
        match rc {
            ffi::Z_OK => Ok(Inflater { strm }),
            ffi::Z_MEM_ERROR => Err(Error::Mem),
            _ => Err(Error::Data("failed to initialize inflate state".into())),
        }
    }

    /// Clear all decoder state, preserving allocations and the window-bits
    /// mode chosen at construction.
    pub fn reset(&mut self) -> Result<()> {
        match unsafe { ffi::inflateReset(&mut *self.strm) } {
            ffi::Z_OK => Ok(()),
            rc => Err(self.decode_error(rc)),
        }
    }

    /// Preload previously decoded output as sliding-window history.  Only
    /// the final 32 KiB of `dict` can ever be referenced; zlib keeps the
    /// tail if given more.
    pub fn set_dictionary(&mut self, dict: &[u8]) -> Result<()> {
        let rc = unsafe {
            ffi::inflateSetDictionary(&mut *self.strm, dict.as_ptr(), dict.len() as c_uint)
        };
        match rc {
            ffi::Z_OK => Ok(()),
            rc => Err(self.decode_error(rc)),
        }
    }

    /// Inject the low `bits` bits of `value` (1–8 of them) as pending input,
    /// so decoding can start mid-byte.
    pub fn prime(&mut self, bits: u32, value: u32) -> Result<()> {
        let rc = unsafe { ffi::inflatePrime(&mut *self.strm, bits as c_int, value as c_int) };
        match rc {
            ffi::Z_OK => Ok(()),
            rc => Err(self.decode_error(rc)),
        }
    }

    /// Drop whatever input bits are still buffered, realigning the decoder
    /// to the next whole byte it is fed.
    pub fn discard_bits(&mut self) -> Result<()> {
        let rc = unsafe { ffi::inflatePrime(&mut *self.strm, -1, 0) };
        match rc {
            ffi::Z_OK => Ok(()),
            rc => Err(self.decode_error(rc)),
        }
    }

    /// Run the decoder over `input` into `output`, stopping per `mode`.
    ///
    /// Returns the status plus how many input bytes were consumed and output
    /// bytes produced.  Unconsumed input must be re-presented on the next
    /// call.  `Z_DATA_ERROR` / `Z_MEM_ERROR` surface as [`Error`]s; buffer
    /// starvation is the [`Status::BufError`] status, mirroring zlib.
    pub fn step(&mut self, input: &[u8], output: &mut [u8], mode: Step) -> Result<(Status, usize, usize)> {
        self.strm.next_in = input.as_ptr() as *mut _;
        self.strm.avail_in = input.len() as c_uint;
        self.strm.next_out = output.as_mut_ptr();
        self.strm.avail_out = output.len() as c_uint;

        let in_before = self.strm.total_in;
        let out_before = self.strm.total_out;
        let rc = unsafe { ffi::inflate(&mut *self.strm, mode as c_int) };
        let consumed = self.strm.total_in.wrapping_sub(in_before) as usize;
        let produced = self.strm.total_out.wrapping_sub(out_before) as usize;

        // Never let pointers into caller slices outlive the call.
        self.strm.next_in = ptr::null_mut();
        self.strm.avail_in = 0;
        self.strm.next_out = ptr::null_mut();
        self.strm.avail_out = 0;

        match rc {
            ffi::Z_OK => Ok((Status::Ok, consumed, produced)),
            ffi::Z_STREAM_END => Ok((Status::StreamEnd, consumed, produced)),
            ffi::Z_BUF_ERROR => Ok((Status::BufError, consumed, produced)),
            rc => Err(self.decode_error(rc)),
        }
    }

    // ── Bit accounting ───────────────────────────────────────────────────────
    //
    // Valid after any `step` return; refreshed on every return.

    /// Bits of the last consumed input byte the decoder has not used (0–7
    /// whenever [`Inflater::at_block_boundary`] holds).
    pub fn unused_bits(&self) -> u32 {
        (self.strm.data_type & 63) as u32
    }

    /// The decoder stopped exactly at a block boundary (or just finished a
    /// wrapper header).
    pub fn at_block_boundary(&self) -> bool {
        self.strm.data_type & 128 != 0
    }

    /// A block header was just fully consumed (set by [`Step::Trees`]).
    pub fn header_done(&self) -> bool {
        self.strm.data_type & 256 != 0
    }

    /// The block currently being decoded carries the final-block flag.
    pub fn last_block(&self) -> bool {
        self.strm.data_type & 64 != 0
    }

    /// Where the code currently being expanded began, or [`Mark::Boundary`].
    ///
    /// The packed value carries two 16-bit fields; the boundary sentinel is
    /// recognized by equality on the unpacked upper field so the extraction
    /// is independent of the platform's signed-shift behavior.
    pub fn mark(&mut self) -> Mark {
        let raw = unsafe { ffi::inflateMark(&mut *self.strm) } as u64;
        let back = ((raw >> 16) & 0xffff) as u32;
        let pending = (raw & 0xffff) as u32;
        if back == 0xffff {
            if pending == 0 {
                Mark::Boundary
            } else {
                Mark::Stored { remaining: pending }
            }
        } else {
            Mark::Code { back, emitted: pending }
        }
    }

    fn decode_error(&self, rc: c_int) -> Error {
        match rc {
            ffi::Z_MEM_ERROR => Error::Mem,
            ffi::Z_DATA_ERROR | ffi::Z_NEED_DICT => {
                Error::Data(self.msg().unwrap_or_else(|| "invalid compressed data".into()))
            }
            ffi::Z_STREAM_ERROR => Error::Data("inconsistent decoder state".into()),
            rc => Error::Data(format!("decoder failure ({rc})")),
        }
    }

    fn msg(&self) -> Option<String> {
        if self.strm.msg.is_null() {
            return None;
        }
        let msg = unsafe { CStr::from_ptr(self.strm.msg) };
        Some(msg.to_string_lossy().into_owned())
    }
}

impl Drop for Inflater {
    fn drop(&mut self) {
        unsafe {
            ffi::inflateEnd(&mut *self.strm);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::DeflateEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn raw_deflate(data: &[u8]) -> Vec<u8> {
        let mut enc = DeflateEncoder::new(Vec::new(), Compression::default());
        enc.write_all(data).unwrap();
        enc.finish().unwrap()
    }

    fn decode_all(inf: &mut Inflater, compressed: &[u8], expect: usize) -> Vec<u8> {
        let mut out = vec![0u8; expect + 64];
        let mut in_pos = 0;
        let mut out_pos = 0;
        loop {
            let (status, consumed, produced) = inf
                .step(&compressed[in_pos..], &mut out[out_pos..], Step::NoFlush)
                .unwrap();
            in_pos += consumed;
            out_pos += produced;
            if status == Status::StreamEnd {
                break;
            }
        }
        out.truncate(out_pos);
        out
    }

    #[test]
    fn raw_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog".repeat(20);
        let compressed = raw_deflate(&data);
        let mut inf = Inflater::raw().unwrap();
        assert_eq!(decode_all(&mut inf, &compressed, data.len()), data);
    }

    #[test]
    fn reset_allows_reuse() {
        let data = b"abcabcabcabc".repeat(10);
        let compressed = raw_deflate(&data);
        let mut inf = Inflater::raw().unwrap();
        assert_eq!(decode_all(&mut inf, &compressed, data.len()), data);
        inf.reset().unwrap();
        assert_eq!(decode_all(&mut inf, &compressed, data.len()), data);
    }

    #[test]
    fn primed_first_byte_matches_plain_decode() {
        let data = b"priming must be equivalent to feeding the byte".repeat(8);
        let compressed = raw_deflate(&data);
        let mut inf = Inflater::raw().unwrap();
        inf.prime(8, u32::from(compressed[0])).unwrap();
        assert_eq!(decode_all(&mut inf, &compressed[1..], data.len()), data);
    }

    #[test]
    fn fresh_decoder_marks_boundary() {
        let mut inf = Inflater::raw().unwrap();
        assert_eq!(inf.mark(), Mark::Boundary);
    }

    #[test]
    fn garbage_input_is_a_data_error() {
        // 0b110 in the low bits selects the reserved block type 11.
        let mut inf = Inflater::raw().unwrap();
        let mut out = [0u8; 64];
        let err = inf.step(&[0x06, 0x00, 0x00], &mut out, Step::NoFlush);
        assert!(matches!(err, Err(Error::Data(_))));
    }
}
