//! Payload transform for `jsys_test`: hash each received buffer and write
//! back its hex digest (spec.md §6).

use md5::{Digest, Md5};
use sha2::{Sha256, Sha512};

/// Which digest to apply, selected by `--hash` (spec.md §6: `0|1|2|3`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// Echo the payload back unchanged.
    None,
    Md5,
    Sha256,
    Sha512,
}

impl Algorithm {
    pub fn from_cli(value: u8) -> Option<Algorithm> {
        match value {
            0 => Some(Algorithm::None),
            1 => Some(Algorithm::Md5),
            2 => Some(Algorithm::Sha256),
            3 => Some(Algorithm::Sha512),
            _ => None,
        }
    }
}

/// Hash `input` per `algorithm`, returning its lowercase hex digest.
///
/// `Algorithm::None` has no digest — callers check for it separately and
/// send `input` back verbatim instead of calling this.
pub fn digest_hex(algorithm: Algorithm, input: &[u8]) -> String {
    match algorithm {
        Algorithm::None => String::new(),
        Algorithm::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(input);
            hex::encode(hasher.finalize())
        }
        Algorithm::Sha256 => {
            let mut hasher = Sha256::new();
            hasher.update(input);
            hex::encode(hasher.finalize())
        }
        Algorithm::Sha512 => {
            let mut hasher = Sha512::new();
            hasher.update(input);
            hex::encode(hasher.finalize())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vector() {
        // spec.md §8 scenario 3.
        assert_eq!(digest_hex(Algorithm::Md5, b"Hello World!"), "ed076287532e86365e841e92bfc50d8c");
    }

    #[test]
    fn sha256_and_sha512_produce_expected_lengths() {
        assert_eq!(digest_hex(Algorithm::Sha256, b"x").len(), 64);
        assert_eq!(digest_hex(Algorithm::Sha512, b"x").len(), 128);
    }

    #[test]
    fn cli_value_parses_into_algorithm() {
        assert_eq!(Algorithm::from_cli(0), Some(Algorithm::None));
        assert_eq!(Algorithm::from_cli(1), Some(Algorithm::Md5));
        assert_eq!(Algorithm::from_cli(2), Some(Algorithm::Sha256));
        assert_eq!(Algorithm::from_cli(3), Some(Algorithm::Sha512));
        assert_eq!(Algorithm::from_cli(4), None);
    }
}
