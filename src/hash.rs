use sha2::{Digest, Sha256};

use crate::error::PackResult;

pub const SHA256_METHOD_URI: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

/// Computes the fixed-length digest recorded for every block.
pub trait HashProvider {
    fn hash_block(&self, block: &[u8]) -> PackResult<Vec<u8>>;

    /// Algorithm identifier written to the block map's `HashMethod` attribute.
    fn method_uri(&self) -> &str;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl HashProvider for Sha256Hasher {
    fn hash_block(&self, block: &[u8]) -> PackResult<Vec<u8>> {
        Ok(Sha256::digest(block).to_vec())
    }

    fn method_uri(&self) -> &str {
        SHA256_METHOD_URI
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let digest = Sha256Hasher.hash_block(b"abc").unwrap();
        assert_eq!(digest.len(), 32);
        assert_eq!(
            digest[..4],
            [0xba, 0x78, 0x16, 0xbf],
            "sha256(\"abc\") starts with ba7816bf"
        );
    }

    #[test]
    fn test_empty_block_digest_is_fixed_length() {
        assert_eq!(Sha256Hasher.hash_block(&[]).unwrap().len(), 32);
    }
}
