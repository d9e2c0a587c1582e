//! A session-key exchange and signature engine for secure messaging
//! formats.
//!
//! Given two opaque cryptographic contexts — one acting as a wrap or
//! signing key, the other as a session key or hash — this crate produces
//! or consumes byte-exact wire artefacts in three dialects: CMS (the
//! ASN.1 DER encodings behind S/MIME and PKCS#7), OpenPGP (tag-delimited
//! binary packets), and the raw/X.509/SSH/TLS-style signature formats.
//!
//! The crate does not implement primitive algorithms itself (see
//! [`context`] for the trait seam), does not host a keyset or object
//! kernel, and exposes no asynchronous surface: every call is a
//! synchronous, single-threaded transform over an in-memory buffer.
//!
//! Four public entry points compose everything else: [`export_key`],
//! [`import_key`], [`create_signature`] and [`check_signature`], plus
//! [`query::query_object`] for introspecting an opaque blob before
//! deciding how to import it.

#![warn(missing_docs)]

extern crate memsec;

#[cfg(test)]
#[macro_use]
extern crate quickcheck;

pub mod cursor;
pub mod algorithm;
pub mod context;
pub mod provider;
pub mod derive;
pub mod oid;
pub mod query;
pub mod subpacket;
pub mod keyex;
pub mod sig;
mod orchestrator;

pub use algorithm::{AlgoClass, CryptAlgo, HashAlgorithm};
pub use context::{CompareMode, HashCtx, KeyCtx, LockGuard};
pub use query::{ObjectKind, QueryInfo};
pub use orchestrator::{check_signature, create_signature, export_key, import_key};

/// Crate result specialization.
pub type Result<T> = ::std::result::Result<T, Error>;

/// Errors returned by this crate.
///
/// Note: this enum cannot be exhaustively matched to allow future
/// extensions.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Malformed encoding: bad ASN.1 length, truncated packet, or a failed
    /// PKCS#1 padding check.
    #[error("Malformed data: {0}")]
    BadData(&'static str),

    /// The buffer ended in the middle of an object.
    #[error("Buffer underflow")]
    Underflow,

    /// Format unsupported at build time, unknown algorithm, or a critical
    /// unknown subpacket.
    #[error("Not available: {0}")]
    NotAvail(&'static str),

    /// A key-id comparison failed, or a generic compare failure was
    /// semantically a wrong key.
    #[error("Wrong key")]
    WrongKey,

    /// Signature verification failed, or an attribute-hash mismatch was
    /// detected.
    #[error("Signature error")]
    SignatureError,

    /// Output buffer too small, or the key too short for the payload.
    #[error("Overflow")]
    Overflow,

    /// Attempted IV mutation on a locked context, or a write to read-only
    /// storage.
    #[error("Permission denied")]
    Permission,

    /// Parameter-specific validation failure. `parameter` names the
    /// offending field rather than an index into the legacy call's
    /// positional argument list.
    #[error("Invalid argument: {parameter}")]
    ArgError {
        /// The name of the invalid parameter.
        parameter: &'static str,
    },

    /// A context used before it was fully initialised.
    #[error("Not initialised")]
    NotInited,

    /// An operation was attempted on an already-finalised hash context.
    #[error("Operation already complete")]
    Complete,

    /// Allocation failure in a bounded buffer.
    #[error("Out of memory")]
    Memory,

    /// An underlying primitive failed for a reason this crate does not
    /// otherwise classify.
    #[error("Operation failed: {0}")]
    Failed(String),

    /// This marks this enum as non-exhaustive. Do not use this variant.
    #[doc(hidden)]
    #[error("__Nonexhaustive")]
    __Nonexhaustive,
}

impl Error {
    /// Translates a generic comparison failure raised by a [`KeyCtx`] into
    /// the codec-layer error it actually means.
    pub(crate) fn from_compare_failed() -> Error {
        Error::WrongKey
    }
}
