//! Reverse-order self test over a freshly built index.

use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::index::DeflateIndex;
use crate::inflate::Inflater;
use crate::seek::{seek_entry, EntryReader};

/// Resume at every entry from last to first, decode one chunk, and require
/// byte equality with the recorded history.
///
/// Interior entries must produce a full chunk; the final entry must produce
/// exactly the remainder of the stream.  Walking in reverse doubles as a
/// check that resuming never mutates the shared history.  Returns the
/// number of entries verified.
pub fn verify_reverse<R: Read + Seek>(
    input: &mut R,
    index: &DeflateIndex,
    history: &[u8],
) -> Result<usize> {
    let mut codec = Inflater::raw()?;
    let mut out = vec![0u8; index.chunk_size];

    for entry in (0..index.len()).rev() {
        seek_entry(&mut codec, input, index, entry, history)?;

        let edge = entry * index.chunk_size;
        let want = (history.len() - edge).min(index.chunk_size);
        let got = EntryReader::new(&mut codec, input).read_into(&mut out)?;
        if got != want {
            return Err(Error::Data(format!(
                "entry {entry}: expected {want} bytes, decoded {got}"
            )));
        }
        if out[..got] != history[edge..edge + got] {
            return Err(Error::Data(format!("entry {entry}: output mismatch")));
        }
    }
    Ok(index.len())
}
