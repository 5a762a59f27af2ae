//! On-disk format: the 12 ASCII bytes `metasm v_1_0` followed by every memory cell as a
//! big-endian 16-bit word, in address order.

use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
};

use crate::{error::LoadError, space::AddressSpace};

/// Format version tag. Must match exactly.
pub const PREAMBLE: &[u8; 12] = b"metasm v_1_0";

/// Serialize the whole address space, unused cells included.
pub fn write_to(space: &AddressSpace, mut out: impl Write) -> io::Result<()> {
    out.write_all(PREAMBLE)?;
    for word in space.cells() {
        out.write_all(&word.to_be_bytes())?;
    }
    out.flush()
}

pub fn to_bytes(space: &AddressSpace) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PREAMBLE.len() + space.cells().len() * 2);
    // Writing into a `Vec` cannot fail
    let _ = write_to(space, &mut buf);
    buf
}

/// Read and validate a binary from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<Box<[u16]>, LoadError> {
    let file = File::open(path).map_err(LoadError::StreamOpen)?;
    let f_size = file.metadata().map_err(LoadError::ContentRead)?.len();
    read_image(file, f_size as usize)
}

/// Validate a binary already held in memory.
pub fn from_bytes(bytes: &[u8]) -> Result<Box<[u16]>, LoadError> {
    read_image(bytes, bytes.len())
}

fn read_image(mut reader: impl Read, f_size: usize) -> Result<Box<[u16]>, LoadError> {
    let mut preamble = [0u8; PREAMBLE.len()];
    reader
        .read_exact(&mut preamble)
        .map_err(LoadError::PreambleRead)?;
    if &preamble != PREAMBLE {
        return Err(LoadError::MalformedPreamble {
            found: preamble.to_vec(),
        });
    }

    let body_len = f_size.saturating_sub(PREAMBLE.len());
    if body_len % 2 != 0 {
        return Err(LoadError::MisalignedBody { len: body_len });
    }

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(body_len)
        .map_err(|_| LoadError::Allocation { bytes: body_len })?;
    reader
        .take(body_len as u64)
        .read_to_end(&mut buffer)
        .map_err(LoadError::ContentRead)?;
    if buffer.len() != body_len {
        return Err(LoadError::ContentRead(io::Error::from(
            io::ErrorKind::UnexpectedEof,
        )));
    }

    Ok(buffer
        .chunks_exact(2)
        .map(|word| u16::from_be_bytes([word[0], word[1]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assemble, space::MEMORY_CELLS};

    fn image() -> AddressSpace {
        assemble("BEGINDATA { x = 513 }\n.top: ADDI 7\nSTR x\nUCB top")
            .unwrap()
            .space
    }

    #[test]
    fn layout_is_bit_exact() {
        let bytes = to_bytes(&image());
        assert_eq!(bytes.len(), 12 + MEMORY_CELLS * 2);
        assert_eq!(&bytes[..12], b"metasm v_1_0");
        assert_eq!(&bytes[12..18], &[0x01, 0x07, 0x09, 0xFE, 0x08, 0x00]);
        // Unused cells are zero
        assert!(bytes[18..bytes.len() - 2].iter().all(|b| *b == 0));
        assert_eq!(&bytes[bytes.len() - 2..], &[0x02, 0x01]);
    }

    #[test]
    fn roundtrip_keeps_body() {
        let space = image();
        let mem = from_bytes(&to_bytes(&space)).unwrap();
        assert_eq!(&mem[..], space.cells());
    }

    #[test]
    fn corrupted_preamble_is_rejected() {
        let bytes = to_bytes(&image());
        for i in 0..PREAMBLE.len() {
            let mut bad = bytes.clone();
            bad[i] ^= 0x20;
            assert!(
                matches!(from_bytes(&bad), Err(LoadError::MalformedPreamble { .. })),
                "byte {i} not checked"
            );
        }
    }

    #[test]
    fn truncated_files() {
        assert!(matches!(
            from_bytes(b"metasm"),
            Err(LoadError::PreambleRead(_))
        ));
        assert!(matches!(from_bytes(b""), Err(LoadError::PreambleRead(_))));

        let mut odd = PREAMBLE.to_vec();
        odd.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            from_bytes(&odd),
            Err(LoadError::MisalignedBody { len: 3 })
        ));

        // Preamble alone is a valid, empty image
        assert_eq!(from_bytes(PREAMBLE).unwrap().len(), 0);
    }

    #[test]
    fn short_body_is_content_error() {
        let bytes = [&PREAMBLE[..], &[0x01u8, 0x02][..]].concat();
        // Claim a larger file than the reader provides
        assert!(matches!(
            read_image(&bytes[..], bytes.len() + 2),
            Err(LoadError::ContentRead(_))
        ));
    }

    #[test]
    fn load_from_disk() {
        let path = std::env::temp_dir().join(format!("metasm-load-{}.bin", std::process::id()));
        let mut file = File::create(&path).unwrap();
        write_to(&image(), &mut file).unwrap();
        drop(file);

        let mem = load(&path).unwrap();
        assert_eq!(mem.len(), MEMORY_CELLS);
        assert_eq!(mem[0], 0x0107);
        std::fs::remove_file(&path).unwrap();

        assert!(matches!(load(&path), Err(LoadError::StreamOpen(_))));
    }
}
