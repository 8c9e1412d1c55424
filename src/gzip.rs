//! Locating the raw DEFLATE payload inside a gzip or zlib file.

use std::io::{self, Read, Seek, SeekFrom};

use crate::error::{Error, Result};
use crate::inflate::{Inflater, Step};

/// Decode the gzip or zlib wrapper at the start of `input` and return the
/// byte offset at which the raw DEFLATE payload begins.
///
/// Wrapper headers always end on a byte boundary, so the offset is exact.
/// The input is left wherever the probe stopped reading; callers seek before
/// further use.
pub fn deflate_start<R: Read + Seek>(input: &mut R) -> Result<u64> {
    input.seek(SeekFrom::Start(0))?;
    let mut codec = Inflater::auto()?;
    let mut buf = [0u8; 512];
    let mut pos: u64 = 0;
    let mut in_pos = 0usize;
    let mut in_len = 0usize;

    // With no output space, block-mode stepping stops right after the
    // wrapper header, before the first deflate block.
    loop {
        if in_pos == in_len {
            let n = match input.read(&mut buf) {
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
        let (_, consumed, _) = codec.step(&buf[in_pos..in_len], &mut [], Step::Block)?;
        in_pos += consumed;
        if codec.at_block_boundary() {
            break;
        }
    }
    Ok(pos - (in_len - in_pos) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::{Cursor, Write};

    #[test]
    fn bare_gzip_header_is_ten_bytes() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"payload location test").unwrap();
        let gz = enc.finish().unwrap();
        assert_eq!(deflate_start(&mut Cursor::new(&gz)).unwrap(), 10);
    }

    #[test]
    fn zlib_header_is_two_bytes() {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(b"payload location test").unwrap();
        let z = enc.finish().unwrap();
        assert_eq!(deflate_start(&mut Cursor::new(&z)).unwrap(), 2);
    }

    #[test]
    fn garbage_is_a_data_error() {
        let junk = [0xffu8; 64];
        assert!(matches!(
            deflate_start(&mut Cursor::new(&junk[..])),
            Err(Error::Data(_))
        ));
    }

    #[test]
    fn empty_input_is_unexpected_eof() {
        assert!(matches!(
            deflate_start(&mut Cursor::new(&[][..])),
            Err(Error::UnexpectedEof)
        ));
    }
}
