//! Key-exchange codecs: per-format read/write of KEKRI/PWRI/KeyTrans/
//! PGP-PKE/PGP-SKE structures.
//!
//! Every write function follows the probe-then-emit idiom: call
//! `encoded_len` to size a buffer, then `encode_into` to fill it. Every
//! read function fills a [`crate::query::QueryInfo`] describing what it
//! found, leaving the caller to act on it (compare key ids, pull out the
//! payload range, etc).

pub mod cms;
pub mod cryptlib;
pub mod pgp;

/// Which key-exchange dialect a blob is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyexKind {
    /// No key-exchange wrapper (bare key bytes).
    None,
    /// Plain CMS KeyTrans/KEKRI/PWRI.
    Cms,
    /// Cryptlib's extended KeyTrans (v3, with an explicit key id).
    Cryptlib,
    /// OpenPGP PKE/SKE.
    Pgp,
}
