//! SSH wire signatures (RFC 4251 string conventions).
//!
//! Grounded in spec.md §4.F: `uint32 total ‖ ssh_string(algoName) ‖
//! uint32 sigLen ‖ sigBytes`, where `algoName ∈ {"ssh-rsa", "ssh-dss"}`.
//! DSA carries its signature as the bare 40-byte `r ‖ s` concatenation
//! (see [`crate::sig::dlp::to_ssh`], the identity map); RSA carries the
//! raw PKCS#1 signature block.

use crate::cursor::{Cursor, Writer};
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::{CryptAlgo, Error, Result};

/// Ceiling on an RSA SSH signature length (a 4096-bit modulus).
pub const MAX_PKCSIZE: usize = 512;

fn algo_name(crypt_algo: CryptAlgo) -> Result<&'static [u8]> {
    match crypt_algo {
        CryptAlgo::Rsa => Ok(b"ssh-rsa"),
        CryptAlgo::Dsa => Ok(b"ssh-dss"),
        _ => Err(Error::NotAvail("algorithm has no SSH signature encoding")),
    }
}

fn check_sig_len(crypt_algo: CryptAlgo, len: usize) -> Result<()> {
    match crypt_algo {
        CryptAlgo::Dsa => {
            if len != 40 {
                return Err(Error::BadData("SSH DSA signature must be 40 bytes"));
            }
        }
        CryptAlgo::Rsa => {
            if !(56..=MAX_PKCSIZE).contains(&len) {
                return Err(Error::BadData("SSH RSA signature length out of range"));
            }
        }
        _ => return Err(Error::NotAvail("algorithm has no SSH signature encoding")),
    }
    Ok(())
}

/// Writes `sig` (already in its per-algorithm native wire shape) as an
/// SSH signature blob.
pub fn write_ssh(crypt_algo: CryptAlgo, sig: &[u8]) -> Result<Vec<u8>> {
    let name = algo_name(crypt_algo)?;
    check_sig_len(crypt_algo, sig.len())?;

    let mut inner = Writer::new();
    inner.write_uint32(name.len() as u32);
    inner.write_bytes(name);
    inner.write_uint32(sig.len() as u32);
    inner.write_bytes(sig);
    let inner = inner.into_vec();

    let mut w = Writer::new();
    w.write_uint32(inner.len() as u32);
    w.write_bytes(&inner);
    Ok(w.into_vec())
}

/// Reads an SSH signature blob, returning the decoded algorithm and the
/// byte range of the signature bytes.
pub fn read_ssh(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let total = c.uint32().ok_or(Error::Underflow)? as usize;
    let body_start = c.pos();

    let name_len = c.uint32().ok_or(Error::Underflow)? as usize;
    let name = c.read_exact(name_len).ok_or(Error::Underflow)?;
    let crypt_algo = match name {
        b"ssh-rsa" => CryptAlgo::Rsa,
        b"ssh-dss" => CryptAlgo::Dsa,
        _ => return Err(Error::NotAvail("unrecognised SSH signature algorithm name")),
    };

    let sig_len = c.uint32().ok_or(Error::Underflow)? as usize;
    let data_start = c.pos();
    c.skip(sig_len);
    if !c.ok() {
        return Err(Error::Underflow);
    }
    if c.pos() - body_start != total {
        return Err(Error::BadData("SSH signature length mismatch"));
    }
    check_sig_len(crypt_algo, sig_len)?;
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Ssh),
        kind: Some(ObjectKind::Signature),
        crypt_algo: Some(crypt_algo),
        data: Some(data_start..data_start + sig_len),
        size: 4 + total,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsa_round_trip() {
        let sig = [0x5u8; 40];
        let bytes = write_ssh(CryptAlgo::Dsa, &sig).unwrap();
        let info = read_ssh(&bytes).unwrap();
        assert_eq!(info.crypt_algo, Some(CryptAlgo::Dsa));
        let range = info.data.unwrap();
        assert_eq!(&bytes[range], &sig[..]);
    }

    #[test]
    fn rsa_round_trip() {
        let sig = vec![0x9u8; 128];
        let bytes = write_ssh(CryptAlgo::Rsa, &sig).unwrap();
        let info = read_ssh(&bytes).unwrap();
        assert_eq!(info.crypt_algo, Some(CryptAlgo::Rsa));
        let range = info.data.unwrap();
        assert_eq!(&bytes[range], &sig[..]);
    }

    #[test]
    fn dsa_wrong_length_rejected() {
        let sig = [0x5u8; 39];
        assert!(write_ssh(CryptAlgo::Dsa, &sig).is_err());
    }
}
