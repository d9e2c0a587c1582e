//! Algorithm identifier registry.
//!
//! Maps this crate's native algorithm identifiers to/from their PGP wire
//! codes and back, across the six classes the mechanism layer cares
//! about. The table is a static, read-only mapping constructed once; no
//! mutation is ever required at runtime (there is no plugin/registration
//! surface — unlike the kernel this crate sits under, algorithms are
//! fixed at compile time).

use crate::{Error, Result};

/// The class an algorithm identifier belongs to, mirroring the six
/// classes the mechanism layer dispatches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgoClass {
    /// Conventional (symmetric bulk) cipher.
    Crypt,
    /// Password-based conventional cipher use (keying via a derived key).
    PwCrypt,
    /// Public-key cipher.
    PkcCrypt,
    /// Signature algorithm.
    Sign,
    /// Hash algorithm.
    Hash,
    /// No class (unrecognised).
    None,
}

/// Symmetric and public-key algorithms this crate's mechanism layer
/// knows how to drive, independent of which wire format carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CryptAlgo {
    /// AES, keyed at 128, 192 or 256 bits.
    Aes,
    /// RSA (used both for signatures and for PKCS#1 key transport).
    Rsa,
    /// DSA (DLP signature algorithm).
    Dsa,
    /// ElGamal (DLP key-transport algorithm).
    ElGamal,
    /// Blowfish, capped at a 16-byte key for PGP interoperability.
    Blowfish,
}

impl CryptAlgo {
    /// The native key size in bytes for algorithms with a single fixed
    /// size; `None` for algorithms whose key size varies by context
    /// (RSA/DSA/ElGamal key sizes come from the context, not the algorithm
    /// identifier — three PGP cipher ids alias a single native AES id, so
    /// the true key size must come from the caller, not this table).
    pub fn fixed_key_size(self) -> Option<usize> {
        match self {
            CryptAlgo::Blowfish => Some(16),
            _ => None,
        }
    }

    /// Maps a PGP symmetric-cipher algorithm byte to a native id.
    pub fn from_pgp_symmetric(id: u8) -> Result<CryptAlgo> {
        match id {
            4 => Ok(CryptAlgo::Blowfish),
            7..=9 => Ok(CryptAlgo::Aes),
            _ => Err(Error::NotAvail("symmetric algorithm")),
        }
    }

    /// Maps a PGP public-key algorithm byte to a native id.
    pub fn from_pgp_public(id: u8) -> Result<CryptAlgo> {
        match id {
            1 | 2 | 3 => Ok(CryptAlgo::Rsa),
            16 => Ok(CryptAlgo::ElGamal),
            17 => Ok(CryptAlgo::Dsa),
            _ => Err(Error::NotAvail("public-key algorithm")),
        }
    }

    /// The PGP public-key algorithm byte for this algorithm, when it has
    /// one canonical encoding (RSA's sign/encrypt split, ids 2 and 3, is
    /// legacy and this crate always writes the unified id 1).
    pub fn to_pgp_public(self) -> Result<u8> {
        match self {
            CryptAlgo::Rsa => Ok(1),
            CryptAlgo::ElGamal => Ok(16),
            CryptAlgo::Dsa => Ok(17),
            _ => Err(Error::NotAvail("not a public-key algorithm")),
        }
    }

    /// The PGP symmetric-cipher algorithm byte, given the caller-supplied
    /// key size in bytes (needed because AES-128/192/256 share no other
    /// distinguishing identifier in this table).
    pub fn to_pgp_symmetric(self, key_size: usize) -> Result<u8> {
        match self {
            CryptAlgo::Aes => match key_size {
                16 => Ok(7),
                24 => Ok(8),
                32 => Ok(9),
                _ => Err(Error::ArgError { parameter: "key_size" }),
            },
            CryptAlgo::Blowfish => Ok(4),
            _ => Err(Error::NotAvail("not a symmetric algorithm")),
        }
    }

    pub(crate) fn class(self) -> AlgoClass {
        match self {
            CryptAlgo::Aes | CryptAlgo::Blowfish => AlgoClass::Crypt,
            CryptAlgo::Rsa | CryptAlgo::ElGamal => AlgoClass::PkcCrypt,
            CryptAlgo::Dsa => AlgoClass::Sign,
        }
    }
}

/// Hash algorithms the registry can produce `init/update/finalise`
/// triples for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5, used only by the SSL 3.0/TLS 1.1 PRF construction.
    Md5,
    /// SHA-1. DSA signatures are constrained to this hash at the wire
    /// layer (160-bit block), regardless of which hash produced the
    /// digest being signed.
    Sha1,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Output size in bytes.
    pub fn digest_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// HMAC/PBKDF2 block size in bytes (the threshold above which keys
    /// must be pre-hashed before use as an HMAC key).
    pub fn block_size(self) -> usize {
        match self {
            HashAlgorithm::Md5 | HashAlgorithm::Sha1 | HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 128,
        }
    }

    /// Maps a PGP hash algorithm byte to a native id.
    pub fn from_pgp(id: u8) -> Result<HashAlgorithm> {
        match id {
            1 => Ok(HashAlgorithm::Md5),
            2 => Ok(HashAlgorithm::Sha1),
            8 => Ok(HashAlgorithm::Sha256),
            9 => Ok(HashAlgorithm::Sha384),
            10 => Ok(HashAlgorithm::Sha512),
            _ => Err(Error::NotAvail("hash algorithm")),
        }
    }

    /// The PGP hash algorithm byte for this hash.
    pub fn to_pgp(self) -> u8 {
        match self {
            HashAlgorithm::Md5 => 1,
            HashAlgorithm::Sha1 => 2,
            HashAlgorithm::Sha256 => 8,
            HashAlgorithm::Sha384 => 9,
            HashAlgorithm::Sha512 => 10,
        }
    }

    /// Constructs a boxed, dynamically-dispatched digest for this
    /// algorithm, so callers drive hashing generically instead of
    /// matching on the algorithm at every call site.
    pub fn hasher(self) -> Box<dyn digest::DynDigest> {
        use md5::Md5;
        use sha2::{Sha256, Sha384, Sha512};
        match self {
            HashAlgorithm::Md5 => Box::new(Md5::default()),
            HashAlgorithm::Sha1 => Box::new(Sha1CdDigest::default()),
            HashAlgorithm::Sha256 => Box::new(Sha256::default()),
            HashAlgorithm::Sha384 => Box::new(Sha384::default()),
            HashAlgorithm::Sha512 => Box::new(Sha512::default()),
        }
    }
}

/// Adapts [`sha1collisiondetection::Sha1CD`] to `digest::DynDigest` and to
/// the `Digest`/`BlockSizeUser` pair that `hmac::SimpleHmac` needs.
///
/// `Sha1CD`'s own "digest-trait" feature implements `Update`/`Reset`/
/// `FixedOutput`, but not `FixedOutputReset` — the bound `DynDigest`'s
/// blanket impl actually requires — so it can't be boxed as `dyn
/// DynDigest` directly. It also has no block-level/`CoreProxy` API, so
/// `hmac::Hmac<D>` (which needs one) can't drive it either; `SimpleHmac<D>`
/// only needs `Digest + BlockSizeUser`, which this newtype supplies. Both
/// gaps are filled by driving `Sha1CD`'s own `finalize_into_dirty_cd`/
/// `reset` methods.
#[derive(Clone, Default)]
pub(crate) struct Sha1CdDigest(sha1collisiondetection::Sha1CD);

impl digest::Update for Sha1CdDigest {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }
}

impl digest::OutputSizeUser for Sha1CdDigest {
    type OutputSize = digest::consts::U20;
}

impl digest::HashMarker for Sha1CdDigest {}

impl digest::core_api::BlockSizeUser for Sha1CdDigest {
    type BlockSize = digest::consts::U64;
}

impl digest::Reset for Sha1CdDigest {
    fn reset(&mut self) {
        self.0.reset();
    }
}

impl digest::FixedOutput for Sha1CdDigest {
    fn finalize_into(mut self, out: &mut digest::Output<Self>) {
        let mut digest = sha1collisiondetection::Output::default();
        let _ = self.0.finalize_into_dirty_cd(&mut digest);
        out.copy_from_slice(&digest);
    }
}

impl digest::FixedOutputReset for Sha1CdDigest {
    fn finalize_into_reset(&mut self, out: &mut digest::Output<Self>) {
        let mut digest = sha1collisiondetection::Output::default();
        let _ = self.0.finalize_into_dirty_cd(&mut digest);
        out.copy_from_slice(&digest);
        self.0.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pgp_public_key_algo_round_trips() {
        for algo in [CryptAlgo::Rsa, CryptAlgo::Dsa, CryptAlgo::ElGamal] {
            let id = algo.to_pgp_public().unwrap();
            assert_eq!(CryptAlgo::from_pgp_public(id).unwrap(), algo);
        }
    }

    #[test]
    fn pgp_hash_algo_round_trips() {
        for algo in [
            HashAlgorithm::Md5,
            HashAlgorithm::Sha1,
            HashAlgorithm::Sha256,
            HashAlgorithm::Sha384,
            HashAlgorithm::Sha512,
        ] {
            assert_eq!(HashAlgorithm::from_pgp(algo.to_pgp()).unwrap(), algo);
        }
    }

    #[test]
    fn aes_symmetric_id_depends_on_key_size() {
        assert_eq!(CryptAlgo::Aes.to_pgp_symmetric(16).unwrap(), 7);
        assert_eq!(CryptAlgo::Aes.to_pgp_symmetric(24).unwrap(), 8);
        assert_eq!(CryptAlgo::Aes.to_pgp_symmetric(32).unwrap(), 9);
        assert!(CryptAlgo::Aes.to_pgp_symmetric(20).is_err());
    }

    #[test]
    fn blowfish_symmetric_id_round_trips() {
        let id = CryptAlgo::Blowfish.to_pgp_symmetric(16).unwrap();
        assert_eq!(id, 4);
        assert_eq!(CryptAlgo::from_pgp_symmetric(id).unwrap(), CryptAlgo::Blowfish);
    }
}
