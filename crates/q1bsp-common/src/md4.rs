// md4.rs — block checksums used to identify map files
// Built on the `md4` crate (RustCrypto).

use md4::{Digest, Md4};

/// Compute a block checksum by XORing all four MD4 digest words.
///
/// Client and server compare this value to make sure both sides loaded the same map.
pub fn com_block_checksum(data: &[u8]) -> u32 {
    let digest = Md4::digest(data);

    digest
        .chunks_exact(4)
        .map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]]))
        .fold(0, |acc, word| acc ^ word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_checksum_empty() {
        // MD4("") = 31d6cfe0 d16ae931 b73c59d7 e0c089c0, words read little-endian
        let expected = u32::from_le_bytes([0x31, 0xd6, 0xcf, 0xe0])
            ^ u32::from_le_bytes([0xd1, 0x6a, 0xe9, 0x31])
            ^ u32::from_le_bytes([0xb7, 0x3c, 0x59, 0xd7])
            ^ u32::from_le_bytes([0xe0, 0xc0, 0x89, 0xc0]);
        assert_eq!(com_block_checksum(b""), expected);
    }

    #[test]
    fn test_block_checksum_abc() {
        // MD4("abc") = a448017a af21d852 5fc10ae8 7aa6729d
        let expected = u32::from_le_bytes([0xa4, 0x48, 0x01, 0x7a])
            ^ u32::from_le_bytes([0xaf, 0x21, 0xd8, 0x52])
            ^ u32::from_le_bytes([0x5f, 0xc1, 0x0a, 0xe8])
            ^ u32::from_le_bytes([0x7a, 0xa6, 0x72, 0x9d]);
        assert_eq!(com_block_checksum(b"abc"), expected);
    }
}
