//! Bit-exactness check of the local deflate implementation.
//!
//! Recompressing an entry on the apply side is only safe when the local
//! compressor reproduces, byte for byte, what the reference implementation
//! (stock zlib) produces. A fixed corpus is compressed at every supported
//! level and the SHA-256 of each raw stream is compared against a recorded
//! table.

use std::sync::OnceLock;

use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zipdelta_common::{Error, Result};

use crate::codec::{compress_raw, DeflateParameters};

/// Version of the corpus and expected-output table.
pub const CORPUS_VERSION: u32 = 1;

struct Expected {
    level: u32,
    compressed_len: usize,
    sha256: &'static str,
}

/// Raw deflate output of [`corpus`] from stock zlib 1.2.13 and 1.3.2
/// (window bits 15, memory level 8, default strategy).
const EXPECTED: [Expected; 9] = [
    Expected {
        level: 1,
        compressed_len: 9008,
        sha256: "e90ba7666bf840d285e5c7ddbf2d75909f593bb38b3b171ccd76acdfbeca226c",
    },
    Expected {
        level: 2,
        compressed_len: 8807,
        sha256: "ab99d463c008cbef37da55348ce88e5761d41d34466cca218bc282e405f03f35",
    },
    Expected {
        level: 3,
        compressed_len: 8670,
        sha256: "288d1e8de3ad80d399085b1e661dd1a8fd3eae352013523b2bab7e0562ca1032",
    },
    Expected {
        level: 4,
        compressed_len: 6998,
        sha256: "0705828ccb348330820d365296f204529a77570cf9d2b2f48fab3f492a519760",
    },
    Expected {
        level: 5,
        compressed_len: 6630,
        sha256: "cf6904693f7562491029cb5876ea068ed84e7995a371382c2fe8d170729ba12e",
    },
    Expected {
        level: 6,
        compressed_len: 6627,
        sha256: "a302cad2bab09f048b8f91d2c756ee4e0f83f08326f6d47aa837c9347cb2eef8",
    },
    Expected {
        level: 7,
        compressed_len: 6621,
        sha256: "868cfcfb8dadcb34282011b7b3aeb82ab90040085e5b99e397dc011e897c699f",
    },
    Expected {
        level: 8,
        compressed_len: 6453,
        sha256: "37f37408c6b5a0346b2e3e5df2bbae4f247f2cfc677db3f61c360258278f9171",
    },
    Expected {
        level: 9,
        compressed_len: 6453,
        sha256: "37f37408c6b5a0346b2e3e5df2bbae4f247f2cfc677db3f61c360258278f9171",
    },
];

/// Generate the compatibility corpus.
///
/// Structured text followed by pseudo-random literals and back-references,
/// so that literal, match and lazy-match paths of the compressor are all
/// exercised at every level.
pub fn corpus() -> Vec<u8> {
    let mut out = Vec::with_capacity(64 * 1024);
    for i in 0..512u32 {
        out.extend_from_slice(
            format!("entry-{i:04}: the quick brown fox jumps over the lazy dog {}\n", i % 17).as_bytes(),
        );
    }

    let mut state: u32 = 0x2545_F491;
    let mut next = move || {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        state >> 16
    };

    const LITERALS: &[u8] = b"etaoinshrdlu";
    for _ in 0..4096 {
        let roll = next();
        if roll % 4 == 0 && out.len() > 300 {
            let back = 1 + (next() % 256) as usize;
            let length = 3 + (next() % 40) as usize;
            let start = out.len() - back;
            for k in 0..length {
                let byte = out[start + k];
                out.push(byte);
            }
        } else {
            out.push(LITERALS[(next() % 12) as usize]);
        }
    }
    out
}

/// Compress the corpus at every supported level and compare with the table.
///
/// Returns true only if every level reproduces the reference output exactly.
pub fn check_compatibility() -> bool {
    let corpus = corpus();
    EXPECTED.iter().all(|expected| {
        let output = match DeflateParameters::new(expected.level).and_then(|p| compress_raw(&corpus, p)) {
            Ok(output) => output,
            Err(e) => {
                warn!(level = expected.level, error = %e, "deflate compatibility probe failed");
                return false;
            }
        };

        let digest = hex::encode(Sha256::digest(&output));
        let matches = output.len() == expected.compressed_len && digest == expected.sha256;
        if !matches {
            debug!(
                level = expected.level,
                expected_len = expected.compressed_len,
                actual_len = output.len(),
                actual_sha256 = %digest,
                "deflate output differs from reference"
            );
        }
        matches
    })
}

static COMPATIBLE: OnceLock<bool> = OnceLock::new();

/// Whether recompression can be trusted to reproduce the reference codec.
///
/// Obtained once with [`detect`](Self::detect) and passed to everything that
/// decides on or performs recompression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeflateCapability {
    compatible: bool,
}

impl DeflateCapability {
    /// Run the compatibility check, at most once per process.
    pub fn detect() -> Self {
        let compatible = *COMPATIBLE.get_or_init(|| {
            let compatible = check_compatibility();
            if compatible {
                debug!(corpus_version = CORPUS_VERSION, "deflate implementation is bit-exact");
            } else {
                warn!(
                    corpus_version = CORPUS_VERSION,
                    "deflate implementation is not bit-exact; recompression disabled"
                );
            }
            compatible
        });
        Self { compatible }
    }

    /// A capability with a fixed answer, for tests and callers that know better.
    pub const fn assume(compatible: bool) -> Self {
        Self { compatible }
    }

    /// Whether recompression is available.
    #[inline]
    pub const fn is_compatible(self) -> bool {
        self.compatible
    }

    /// Fail with [`Error::CompatibilityUnavailable`] if recompression is unavailable.
    pub fn require(self) -> Result<()> {
        if self.compatible {
            Ok(())
        } else {
            Err(Error::CompatibilityUnavailable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corpus_is_stable() {
        let corpus = corpus();
        assert_eq!(corpus.len(), 57059);
        assert_eq!(
            hex::encode(Sha256::digest(&corpus)),
            "9cd75c3a1e18aaa6714096bbcdf4af0c609b16e6c7d30c1bcc438cb16762a235"
        );
    }

    #[test]
    fn test_bundled_zlib_is_compatible() {
        assert!(check_compatibility());
        assert!(DeflateCapability::detect().is_compatible());
    }

    #[test]
    fn test_detect_is_cached() {
        assert_eq!(DeflateCapability::detect(), DeflateCapability::detect());
    }

    #[test]
    fn test_assumed_capability() {
        assert!(DeflateCapability::assume(true).require().is_ok());
        assert!(matches!(
            DeflateCapability::assume(false).require(),
            Err(Error::CompatibilityUnavailable)
        ));
    }
}
