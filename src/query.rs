//! Object introspection: "what is this blob?"
//!
//! Given an opaque buffer, decides whether it is ASN.1 or PGP, then
//! identifies the object kind so the orchestrator can route it to the
//! right codec without the caller having to guess the format up front.

use crate::cursor::{tag, Cursor, MIN_CRYPT_OBJECTSIZE};
use crate::{Error, Result};
use std::ops::Range;

/// The wire dialect a blob is encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Cryptlib's own extended CMS-like format (version 2/3 variants).
    Cryptlib,
    /// Plain CMS (RFC 5652).
    Cms,
    /// S/MIME (wire-identical to CMS at this layer).
    Smime,
    /// OpenPGP tag-delimited packets.
    Pgp,
    /// SSH wire signatures.
    Ssh,
    /// SSL 3.0/TLS raw signatures.
    Ssl,
    /// X.509 `AlgorithmIdentifier`-prefixed signatures.
    X509,
    /// A bare `BIT STRING`/octet blob with no format markers.
    Raw,
}

/// What kind of object a blob was identified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    /// Not a recognised object (e.g. a one-pass signature header, whose
    /// kind is reported as `None` even though a dedicated reader exists).
    None,
    /// A password-wrapped session key.
    EncryptedKey,
    /// A public-key-wrapped session key.
    PkcEncryptedKey,
    /// A signature.
    Signature,
    /// A PGP one-pass signature header.
    OnePassSig,
    /// A recognised-but-unsupported key-agreement RecipientInfo
    /// (Fortezza/KEA's `[1] KeyAgreeRecipientInfo` tag family).
    KeyAgreement,
}

/// The decoded-metadata record produced by every codec read function
/// and by [`query_object`].
#[derive(Debug, Clone, Default)]
pub struct QueryInfo {
    /// The wire dialect.
    pub format: Option<Format>,
    /// The object kind.
    pub kind: Option<ObjectKind>,
    /// Protocol version byte.
    pub version: u8,
    /// Bulk-cipher algorithm, if applicable.
    pub crypt_algo: Option<crate::algorithm::CryptAlgo>,
    /// Hash algorithm, if applicable.
    pub hash_algo: Option<crate::algorithm::HashAlgorithm>,
    /// Key id bytes (PGP and native flavours are distinguished by
    /// `version`/context, not by a separate field).
    pub key_id: Vec<u8>,
    /// Salt bytes, if this object carries key-derivation salt.
    pub salt: Vec<u8>,
    /// IV bytes, if this object carries an explicit IV.
    pub iv: Vec<u8>,
    /// Key-setup iteration count.
    pub key_setup_iterations: u32,
    /// `IssuerAndSerialNumber` byte range within the source buffer.
    pub issuer_and_serial: Option<Range<usize>>,
    /// Signed-attributes byte range within the source buffer.
    pub attribute: Option<Range<usize>>,
    /// Unsigned-attributes byte range within the source buffer.
    pub unauth_attribute: Option<Range<usize>>,
    /// Encrypted/signed payload byte range within the source buffer.
    pub data: Option<Range<usize>>,
    /// Total object length.
    pub size: usize,
}

impl QueryInfo {
    /// Returns the bytes named by `range` inside `buf`, checked to be
    /// fully contained in it — the enforcement point for the "every
    /// slice field is fully contained within the source buffer"
    /// invariant.
    pub fn slice<'a>(&self, buf: &'a [u8], range: &Range<usize>) -> Option<&'a [u8]> {
        buf.get(range.clone())
    }
}

/// PGP packet tag values this crate recognises.
mod pgp_tag {
    pub const PKE: u8 = 1;
    pub const SIGNATURE: u8 = 2;
    pub const SKE: u8 = 3;
    pub const ONEPASS_SIG: u8 = 4;
}

/// CMS `RecipientInfo` context tags.
mod ctag {
    pub const KEKRI: u8 = 1;
    pub const PWRI: u8 = 2;
    pub const KEYAGREE: u8 = 1; // shares the KEKRI slot in some profiles
    pub const RI_MAX: u8 = 9;
}

/// Identifies the format and kind of an opaque blob.
///
/// Succeeds only if the full object, per its own length field, fits
/// within `buf`; otherwise returns [`Error::Underflow`].
pub fn query_object(buf: &[u8]) -> Result<QueryInfo> {
    if buf.len() < MIN_CRYPT_OBJECTSIZE {
        return Err(Error::Underflow);
    }
    match buf[0] {
        tag::SEQUENCE => query_asn1_object(buf),
        b if b == tag::make_ctag(3) => query_asn1_object(buf),
        _ => query_pgp_object(buf),
    }
}

fn query_asn1_object(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let outer_tag = c.peek_tag().ok_or(Error::Underflow)?;
    let len = c.read_tlv_header(outer_tag).ok_or(Error::Underflow)?;
    let body_start = c.pos();
    if body_start + len > buf.len() {
        return Err(Error::Underflow);
    }

    let mut info = QueryInfo {
        size: body_start + len,
        ..Default::default()
    };

    if outer_tag == tag::make_ctag(3) {
        // KEKRI/PWRI recipient info: version byte, then either a KEKRI
        // or PWRI body depending on the next context tag.
        let version = c.read_short_integer().ok_or(Error::Underflow)?;
        info.version = version as u8;
        let next = c.peek_tag().ok_or(Error::Underflow)?;
        match next {
            t if t == tag::make_ctag(ctag::KEKRI) => {
                info.format = Some(Format::Cms);
                info.kind = Some(ObjectKind::EncryptedKey);
            }
            t if t == tag::make_ctag(ctag::PWRI) => {
                info.format = Some(Format::Cms);
                info.kind = Some(ObjectKind::EncryptedKey);
            }
            t if (t & 0x1f) > ctag::PWRI && (t & 0x1f) <= ctag::RI_MAX => {
                // New RecipientInfo kinds this crate doesn't implement;
                // reported so the caller can skip it rather than fail.
                info.kind = Some(ObjectKind::KeyAgreement);
            }
            _ => return Err(Error::BadData("unrecognised RecipientInfo tag")),
        }
        return Ok(info);
    }

    // Plain SEQUENCE: the leading INTEGER version discriminates KeyTrans
    // vs cryptlib-KeyTrans vs SignerInfo vs cryptlib-signature.
    let version = c.read_short_integer().ok_or(Error::Underflow)?;
    info.version = version as u8;
    match version {
        0 => {
            info.format = Some(Format::Cms);
            info.kind = Some(ObjectKind::PkcEncryptedKey);
        }
        1 => {
            info.format = Some(Format::Cms);
            info.kind = Some(ObjectKind::Signature);
        }
        2 => {
            info.format = Some(Format::Cryptlib);
            info.kind = Some(ObjectKind::PkcEncryptedKey);
        }
        3 => {
            info.format = Some(Format::Cryptlib);
            info.kind = Some(ObjectKind::Signature);
        }
        4 => {
            info.format = Some(Format::Cms);
            info.kind = Some(ObjectKind::EncryptedKey);
        }
        _ => return Err(Error::NotAvail("unrecognised ASN.1 object version")),
    }
    Ok(info)
}

fn query_pgp_object(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let (ptag, body_len) = c.read_packet_header().ok_or(Error::Underflow)?;
    let header_len = c.pos();
    if header_len + body_len > buf.len() {
        return Err(Error::Underflow);
    }

    let mut info = QueryInfo {
        size: header_len + body_len,
        ..Default::default()
    };

    match ptag {
        pgp_tag::PKE => {
            info.format = Some(Format::Pgp);
            info.kind = Some(ObjectKind::PkcEncryptedKey);
        }
        pgp_tag::SKE => {
            info.format = Some(Format::Pgp);
            info.kind = Some(ObjectKind::EncryptedKey);
        }
        pgp_tag::SIGNATURE => {
            info.format = Some(Format::Pgp);
            info.kind = Some(ObjectKind::Signature);
        }
        pgp_tag::ONEPASS_SIG => {
            info.format = Some(Format::Pgp);
            // Matches the legacy quirk: the *kind* is reported as `None`
            // even though a dedicated one-pass-signature reader exists
            // and must be invoked by the caller.
            info.kind = Some(ObjectKind::None);
        }
        _ => return Err(Error::NotAvail("unrecognised PGP packet type")),
    }
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::Writer;

    #[test]
    fn rejects_undersized_buffers() {
        assert_eq!(query_object(&[0u8; 4]), Err(Error::Underflow));
    }

    #[test]
    fn recognises_pgp_ske_packet() {
        let buf = [0xc3u8, 0x04, 0x04, 0x07, 0x03, 0x02, 0, 0, 0, 0, 0, 0, 0, 0, 0x60];
        let info = query_object(&buf).unwrap();
        assert_eq!(info.format, Some(Format::Pgp));
        assert_eq!(info.kind, Some(ObjectKind::EncryptedKey));
    }

    #[test]
    fn recognises_cms_keytrans_v1() {
        let mut w = Writer::new();
        let mut body = Writer::new();
        body.write_integer(0);
        // Minimal trailing bytes so the declared length plausibly fits.
        body.write_bytes(&[0u8; 20]);
        let body = body.into_vec();
        w.write_sequence_header(body.len());
        w.write_bytes(&body);
        let bytes = w.into_vec();
        let info = query_object(&bytes).unwrap();
        assert_eq!(info.format, Some(Format::Cms));
        assert_eq!(info.kind, Some(ObjectKind::PkcEncryptedKey));
    }
}
