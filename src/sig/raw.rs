//! Raw and X.509 signatures: a `BIT STRING` wrapper around the signature
//! bytes, with X.509 additionally prepending a signature
//! `AlgorithmIdentifier`.
//!
//! Grounded in spec.md §4.F ("Raw / X.509"): read stores a slice pointer
//! to the `BIT STRING` contents rather than copying, matching the
//! `data`-range convention the key-exchange codecs already use.

use crate::cursor::{tag, Cursor, Writer};
use crate::oid;
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::{CryptAlgo, Error, HashAlgorithm, Result};

/// Reads a bare `BIT STRING`-wrapped signature, returning the byte range
/// of the signature bytes themselves (after the one "unused bits" octet
/// every `BIT STRING` carries).
pub fn read_raw(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let len = c.read_tlv_header(tag::BIT_STRING).ok_or(Error::Underflow)?;
    let unused_bits = c.read_byte().ok_or(Error::Underflow)?;
    if unused_bits != 0 {
        return Err(Error::BadData("signature BIT STRING has unused bits"));
    }
    let (data_start, data_len) = {
        let start = c.pos();
        c.skip(len - 1);
        (start, len - 1)
    };
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Raw),
        kind: Some(ObjectKind::Signature),
        data: Some(data_start..data_start + data_len),
        size: data_start + data_len,
        ..Default::default()
    })
}

/// Writes `sig` as a bare `BIT STRING`.
pub fn write_raw(sig: &[u8]) -> Vec<u8> {
    let mut content = Vec::with_capacity(sig.len() + 1);
    content.push(0); // unused bits
    content.extend_from_slice(sig);
    let mut w = Writer::new();
    w.write_tlv(tag::BIT_STRING, &content);
    w.into_vec()
}

/// Reads an X.509-style signature: a signature `AlgorithmIdentifier`
/// immediately followed by the `BIT STRING`.
pub fn read_x509(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let (algo_oid, _params) = c.read_algo_id().ok_or(Error::Underflow)?;
    let (crypt_algo, hash_algo) = oid::sig_algo_from_oid(algo_oid)?;

    let bitstr_len = c.read_tlv_header(tag::BIT_STRING).ok_or(Error::Underflow)?;
    let unused_bits = c.read_byte().ok_or(Error::Underflow)?;
    if unused_bits != 0 {
        return Err(Error::BadData("signature BIT STRING has unused bits"));
    }
    let data_start = c.pos();
    let data_len = bitstr_len - 1;
    c.skip(data_len);
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::X509),
        kind: Some(ObjectKind::Signature),
        crypt_algo: Some(crypt_algo),
        hash_algo: Some(hash_algo),
        data: Some(data_start..data_start + data_len),
        size: data_start + data_len,
        ..Default::default()
    })
}

/// Writes an X.509-style signature for `(crypt_algo, hash_algo)`.
pub fn write_x509(crypt_algo: CryptAlgo, hash_algo: HashAlgorithm, sig: &[u8]) -> Result<Vec<u8>> {
    let algo_oid = oid::sig_algo_oid(crypt_algo, hash_algo)?;
    let mut w = Writer::new();
    w.write_algo_id(algo_oid, None);
    w.write_bytes(&write_raw(sig));
    Ok(w.into_vec())
}
