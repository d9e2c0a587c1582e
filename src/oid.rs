//! ASN.1 object identifiers this crate needs to read or write, as their
//! already-DER-encoded content-octet bytes (the value of an `OID` TLV,
//! not including the universal tag/length).
//!
//! cryptlib carries its own `gen_obj_algo_table[]`-style constant list
//! (see `obj_qry.c`/`keyex.c`); this module is the Rust equivalent for
//! the handful of algorithm identifiers component E/F actually read or
//! write.

use crate::algorithm::{CryptAlgo, HashAlgorithm};
use crate::{Error, Result};

/// `1.2.840.113549.1.5.12` — `id-PBKDF2`.
pub const PBKDF2: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x05, 0x0c];

/// `1.2.840.113549.1.9.16.3.9` — `id-alg-PWRIKEK`, the CMS PWRI
/// key-wrap-algorithm wrapper OID.
pub const PWRIKEK: &[u8] = &[
    0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x10, 0x03, 0x09,
];

/// `1.2.840.113549.1.1.1` — `rsaEncryption`.
pub const RSA_ENCRYPTION: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x01];
/// `1.2.840.113549.1.1.5` — `sha1WithRSAEncryption`.
pub const SHA1_WITH_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x05];
/// `1.2.840.113549.1.1.11` — `sha256WithRSAEncryption`.
pub const SHA256_WITH_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0b];
/// `1.2.840.113549.1.1.13` — `sha512WithRSAEncryption`.
pub const SHA512_WITH_RSA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x01, 0x0d];

/// `1.2.840.10040.4.1` — `id-dsa`.
pub const DSA: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x38, 0x04, 0x01];
/// `1.2.840.10040.4.3` — `id-dsa-with-sha1`.
pub const DSA_WITH_SHA1: &[u8] = &[0x2a, 0x86, 0x48, 0xce, 0x38, 0x04, 0x03];

/// `1.3.14.3.2.26` — `id-sha1`.
pub const SHA1: &[u8] = &[0x2b, 0x0e, 0x03, 0x02, 0x1a];
/// `2.16.840.1.101.3.4.2.1` — `id-sha256`.
pub const SHA256: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
/// `2.16.840.1.101.3.4.2.2` — `id-sha384`.
pub const SHA384: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x02];
/// `2.16.840.1.101.3.4.2.3` — `id-sha512`.
pub const SHA512: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x03];

/// `2.16.840.1.101.3.4.1.5` — `id-aes128-wrap`.
pub const AES128_WRAP: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x05];
/// `2.16.840.1.101.3.4.1.25` — `id-aes192-wrap`.
pub const AES192_WRAP: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x19];
/// `2.16.840.1.101.3.4.1.45` — `id-aes256-wrap`.
pub const AES256_WRAP: &[u8] = &[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x01, 0x2d];

/// `1.2.840.113549.1.9.3` — `contentType` signed attribute.
pub const CONTENT_TYPE: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x03];
/// `1.2.840.113549.1.9.4` — `messageDigest` signed attribute.
pub const MESSAGE_DIGEST: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x04];
/// `1.2.840.113549.1.9.5` — `signingTime` signed attribute.
pub const SIGNING_TIME: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x09, 0x05];
/// `1.2.840.113549.1.7.1` — `data` content type (placeholder value for
/// the `contentType` attribute this crate emits).
pub const PKCS7_DATA: &[u8] = &[0x2a, 0x86, 0x48, 0x86, 0xf7, 0x0d, 0x01, 0x07, 0x01];

/// Maps a public-key encryption `AlgorithmIdentifier` OID to a native id.
/// CMS/cryptlib key transport in this crate only ever uses RSA.
pub fn pkc_algo_from_oid(oid: &[u8]) -> Result<CryptAlgo> {
    if oid == RSA_ENCRYPTION {
        Ok(CryptAlgo::Rsa)
    } else {
        Err(Error::NotAvail("unrecognised key-transport algorithm OID"))
    }
}

/// The `AlgorithmIdentifier` OID for a PKC encryption algorithm.
pub fn pkc_algo_oid(algo: CryptAlgo) -> Result<&'static [u8]> {
    match algo {
        CryptAlgo::Rsa => Ok(RSA_ENCRYPTION),
        _ => Err(Error::NotAvail("no AlgorithmIdentifier OID for this PKC algorithm")),
    }
}

/// Maps a hash `AlgorithmIdentifier` OID to a native id.
pub fn hash_algo_from_oid(oid: &[u8]) -> Result<HashAlgorithm> {
    match oid {
        SHA1 => Ok(HashAlgorithm::Sha1),
        SHA256 => Ok(HashAlgorithm::Sha256),
        SHA384 => Ok(HashAlgorithm::Sha384),
        SHA512 => Ok(HashAlgorithm::Sha512),
        _ => Err(Error::NotAvail("unrecognised hash algorithm OID")),
    }
}

/// The `AlgorithmIdentifier` OID for a hash algorithm.
pub fn hash_algo_oid(algo: HashAlgorithm) -> Result<&'static [u8]> {
    match algo {
        HashAlgorithm::Sha1 => Ok(SHA1),
        HashAlgorithm::Sha256 => Ok(SHA256),
        HashAlgorithm::Sha384 => Ok(SHA384),
        HashAlgorithm::Sha512 => Ok(SHA512),
        HashAlgorithm::Md5 => Err(Error::NotAvail("MD5 has no signature-layer OID in this crate")),
    }
}

/// The combined signature `AlgorithmIdentifier` OID (`sha256WithRSAEncryption`
/// and friends) for a `(crypt, hash)` pair.
pub fn sig_algo_oid(crypt: CryptAlgo, hash: HashAlgorithm) -> Result<&'static [u8]> {
    match (crypt, hash) {
        (CryptAlgo::Rsa, HashAlgorithm::Sha1) => Ok(SHA1_WITH_RSA),
        (CryptAlgo::Rsa, HashAlgorithm::Sha256) => Ok(SHA256_WITH_RSA),
        (CryptAlgo::Rsa, HashAlgorithm::Sha512) => Ok(SHA512_WITH_RSA),
        (CryptAlgo::Dsa, HashAlgorithm::Sha1) => Ok(DSA_WITH_SHA1),
        _ => Err(Error::NotAvail("unsupported signature algorithm/hash combination")),
    }
}

/// Inverse of [`sig_algo_oid`].
pub fn sig_algo_from_oid(oid: &[u8]) -> Result<(CryptAlgo, HashAlgorithm)> {
    match oid {
        SHA1_WITH_RSA => Ok((CryptAlgo::Rsa, HashAlgorithm::Sha1)),
        SHA256_WITH_RSA => Ok((CryptAlgo::Rsa, HashAlgorithm::Sha256)),
        SHA512_WITH_RSA => Ok((CryptAlgo::Rsa, HashAlgorithm::Sha512)),
        DSA_WITH_SHA1 => Ok((CryptAlgo::Dsa, HashAlgorithm::Sha1)),
        _ => Err(Error::NotAvail("unrecognised signature algorithm OID")),
    }
}

/// The key-wrap `AlgorithmIdentifier` OID for an AES KEK of `key_len` bytes.
pub fn aes_wrap_oid(key_len: usize) -> Result<&'static [u8]> {
    match key_len {
        16 => Ok(AES128_WRAP),
        24 => Ok(AES192_WRAP),
        32 => Ok(AES256_WRAP),
        _ => Err(Error::ArgError { parameter: "key_len" }),
    }
}
