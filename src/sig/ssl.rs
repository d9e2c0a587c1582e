//! SSL 3.0/TLS raw signatures: no algorithm identifier, just a
//! length-prefixed blob.
//!
//! Grounded in spec.md §4.F ("SSH / SSL signatures"): `uint16 len ‖
//! bytes`.

use crate::cursor::{Cursor, Writer};
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::{Error, Result};

/// Writes `sig` as `uint16 len ‖ bytes`.
pub fn write_ssl(sig: &[u8]) -> Result<Vec<u8>> {
    if sig.len() > u16::MAX as usize {
        return Err(Error::Overflow);
    }
    let mut w = Writer::new();
    w.write_uint16(sig.len() as u16);
    w.write_bytes(sig);
    Ok(w.into_vec())
}

/// Reads an SSL-style signature, returning the byte range of the
/// signature bytes.
pub fn read_ssl(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let len = c.uint16().ok_or(Error::Underflow)? as usize;
    let data_start = c.pos();
    c.skip(len);
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Ssl),
        kind: Some(ObjectKind::Signature),
        data: Some(data_start..data_start + len),
        size: data_start + len,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let sig = vec![0xeeu8; 48];
        let bytes = write_ssl(&sig).unwrap();
        let info = read_ssl(&bytes).unwrap();
        let range = info.data.unwrap();
        assert_eq!(&bytes[range], &sig[..]);
    }
}
