//! Transparent decompression selected by magic bytes.

use bzip2::read::BzDecoder;
use flate2::read::MultiGzDecoder;
use std::io::{self, BufRead, BufReader, Read};
use xz2::read::XzDecoder;

/// Stream compression recognised by [`decompress`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
}

/// Magic prefixes; `?` matches any byte.
const MAGIC: &[(&[u8], Compression)] = &[
    (b"BZh??", Compression::Bzip2),
    (b"\x1f\x8b", Compression::Gzip),
    (b"\xfd7zXZ\x00", Compression::Xz),
];

fn matches_magic(magic: &[u8], head: &[u8]) -> bool {
    head.len() >= magic.len()
        && magic
            .iter()
            .zip(head)
            .all(|(&m, &b)| m == b'?' || m == b)
}

/// Identify the compression of a stream from its first bytes.
pub fn detect(head: &[u8]) -> Compression {
    MAGIC
        .iter()
        .find(|(magic, _)| matches_magic(magic, head))
        .map(|&(_, kind)| kind)
        .unwrap_or(Compression::None)
}

/// Wrap `reader` in the decoder its leading bytes call for.
///
/// Streams that match no known magic are returned unchanged.
pub fn decompress<R: Read + Send + 'static>(reader: R) -> io::Result<Box<dyn Read + Send>> {
    let mut reader = BufReader::new(reader);
    let kind = detect(reader.fill_buf()?);
    Ok(match kind {
        Compression::None => Box::new(reader),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        Compression::Bzip2 => Box::new(BzDecoder::new(reader)),
        Compression::Xz => Box::new(XzDecoder::new(reader)),
    })
}
