//! DLP (discrete-log-problem) signature specialisation.
//!
//! [`crate::provider::DsaContext::sign`]/`verify` speak one canonical
//! representation: `r ‖ s`, each exactly [`DLP_COMPONENT_SIZE`] bytes
//! (the 160-bit block size this crate's DSA is constrained to). Every
//! wire format serialises that pair differently — this module is the
//! one place that translation happens, so the per-format codecs in
//! [`crate::sig`] never touch big-integer encoding directly.

use crate::cursor::{tag, Cursor, Writer};
use crate::{Error, Result};

/// Size in bytes of each of `r`/`s` for the 160-bit DSA this crate
/// supports (DSA's hash input is always exactly this many bytes too).
pub const DLP_COMPONENT_SIZE: usize = 20;

/// Splits the native `r ‖ s` signature into its two components.
pub fn split_native(sig: &[u8]) -> Result<(&[u8], &[u8])> {
    if sig.len() != 2 * DLP_COMPONENT_SIZE {
        return Err(Error::ArgError { parameter: "sig" });
    }
    Ok(sig.split_at(DLP_COMPONENT_SIZE))
}

pub(crate) fn pad_component(bytes: &[u8]) -> Result<[u8; DLP_COMPONENT_SIZE]> {
    if bytes.len() > DLP_COMPONENT_SIZE {
        return Err(Error::BadData("DLP signature component too large"));
    }
    let mut out = [0u8; DLP_COMPONENT_SIZE];
    out[DLP_COMPONENT_SIZE - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}

/// Encodes a native signature as two back-to-back OpenPGP MPIs.
pub fn to_pgp(sig: &[u8]) -> Result<Vec<u8>> {
    let (r, s) = split_native(sig)?;
    let mut w = Writer::new();
    w.write_mpi(r);
    w.write_mpi(s);
    Ok(w.into_vec())
}

/// Decodes two back-to-back OpenPGP MPIs into a native signature.
pub fn from_pgp(buf: &[u8]) -> Result<Vec<u8>> {
    let mut c = Cursor::new(buf);
    let (_, r) = c.read_mpi().ok_or(Error::Underflow)?;
    let (_, s) = c.read_mpi().ok_or(Error::Underflow)?;
    let r = pad_component(r)?;
    let s = pad_component(s)?;
    c.finish()?;
    let mut out = Vec::with_capacity(2 * DLP_COMPONENT_SIZE);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

/// SSH carries the pair as the fixed-size raw concatenation already used
/// natively, so this is the identity map — kept as a named entry point
/// so callers never have to special-case "no translation needed".
pub fn to_ssh(sig: &[u8]) -> Result<Vec<u8>> {
    split_native(sig)?;
    Ok(sig.to_vec())
}

/// Inverse of [`to_ssh`].
pub fn from_ssh(bytes: &[u8]) -> Result<Vec<u8>> {
    split_native(bytes)?;
    Ok(bytes.to_vec())
}

fn write_der_integer(w: &mut Writer, bytes: &[u8]) {
    let mut v = bytes.to_vec();
    let mut i = 0;
    while i < v.len().saturating_sub(1) && v[i] == 0 {
        i += 1;
    }
    v = v[i..].to_vec();
    if v.is_empty() {
        v = vec![0];
    }
    if v[0] & 0x80 != 0 {
        v.insert(0, 0);
    }
    w.write_tlv(tag::INTEGER, &v);
}

fn read_der_integer(c: &mut Cursor) -> Option<Vec<u8>> {
    let len = c.read_tlv_header(tag::INTEGER)?;
    let bytes = c.read_exact(len)?;
    let mut v = bytes.to_vec();
    let mut i = 0;
    while i < v.len().saturating_sub(1) && v[i] == 0 {
        i += 1;
    }
    Some(v[i..].to_vec())
}

/// Encodes a native signature as `SEQUENCE { INTEGER r, INTEGER s }`
/// (the CMS/X.509 DLP signature value format).
pub fn to_der(sig: &[u8]) -> Result<Vec<u8>> {
    let (r, s) = split_native(sig)?;
    let mut body = Writer::new();
    write_der_integer(&mut body, r);
    write_der_integer(&mut body, s);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Inverse of [`to_der`].
pub fn from_der(buf: &[u8]) -> Result<Vec<u8>> {
    let mut c = Cursor::new(buf);
    let _len = c.read_sequence().ok_or(Error::Underflow)?;
    let r = read_der_integer(&mut c).ok_or(Error::Underflow)?;
    let s = read_der_integer(&mut c).ok_or(Error::Underflow)?;
    c.finish()?;
    let r = pad_component(&r)?;
    let s = pad_component(&s)?;
    let mut out = Vec::with_capacity(2 * DLP_COMPONENT_SIZE);
    out.extend_from_slice(&r);
    out.extend_from_slice(&s);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sig() -> Vec<u8> {
        let mut r = vec![0u8; DLP_COMPONENT_SIZE];
        let mut s = vec![0u8; DLP_COMPONENT_SIZE];
        r[DLP_COMPONENT_SIZE - 1] = 0x7a;
        r[0] = 0x80; // exercises the DER sign-bit padding path
        s[DLP_COMPONENT_SIZE - 1] = 0x05;
        let mut out = r;
        out.extend_from_slice(&s);
        out
    }

    #[test]
    fn pgp_round_trip() {
        let sig = sample_sig();
        let pgp = to_pgp(&sig).unwrap();
        let back = from_pgp(&pgp).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn der_round_trip_with_sign_bit_padding() {
        let sig = sample_sig();
        let der = to_der(&sig).unwrap();
        // Leading 0x00 inserted ahead of the 0x80-prefixed r component.
        assert_eq!(der[2], tag::INTEGER);
        assert_eq!(der[4], 0x00);
        let back = from_der(&der).unwrap();
        assert_eq!(back, sig);
    }

    #[test]
    fn ssh_is_identity() {
        let sig = sample_sig();
        assert_eq!(to_ssh(&sig).unwrap(), sig);
        assert_eq!(from_ssh(&sig).unwrap(), sig);
    }
}
