//! Signature codecs: per-format read/write of raw/X.509/CMS/cryptlib/
//! PGP/SSH/SSL signatures.
//!
//! `dlp` holds the one shared DSA wire-representation translator the
//! per-format codecs below call into rather than re-deriving DER/MPI
//! encoding rules each time a format needs to carry a DSA signature.

pub mod cms;
pub mod cryptlib;
pub mod dlp;
pub mod pgp;
pub mod raw;
pub mod ssh;
pub mod ssl;

/// Which signature dialect a blob is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    /// Bare `BIT STRING`, no algorithm identifier.
    Raw,
    /// X.509-style: AlgorithmIdentifier followed by a `BIT STRING`.
    X509,
    /// CMS `SignerInfo` (v1), with optional signed/unsigned attributes.
    Cms,
    /// Cryptlib's extended signature form (v3, with an explicit key id).
    Cryptlib,
    /// OpenPGP v4 signature packet.
    Pgp,
    /// SSH wire signature.
    Ssh,
    /// SSL 3.0/TLS raw signature.
    Ssl,
}
