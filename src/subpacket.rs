//! OpenPGP v4 signature subpacket areas.
//!
//! A subpacket area is a flat sequence of `(type, body)` pairs using
//! their own length-prefix convention (distinct from packet-body
//! lengths). The critical-bit rule is the one piece of subpacket
//! handling this crate actually needs to get right: an unrecognised
//! subpacket with the critical bit set must fail the whole parse,
//! while an unrecognised non-critical one is simply skipped.

use crate::cursor::{Cursor, Writer};
use crate::{Error, Result};

/// The highest subpacket type number this crate recognises by name.
/// Anything above this is "unknown" for the critical-bit rule, whether
/// or not a future RFC has since defined it.
pub const LAST_SUBPACKET: u8 = 33;

/// Recognised subpacket types.
///
/// `PartialEq`/`Eq` are implemented by hand below (comparing
/// [`SubpacketType::to_byte`]) rather than derived, so that `Unknown(2)`
/// compares equal to `SignatureCreationTime` — both name the same wire
/// type byte, just via different construction paths.
#[derive(Debug, Clone, Copy)]
pub enum SubpacketType {
    /// Signature creation time (type 2).
    SignatureCreationTime,
    /// Issuer key id, the v3-style 8-byte key id (type 16).
    IssuerKeyId,
    /// Notation data (type 20) — used to carry the optional
    /// `typeAndValue(name="issuerAndSerialNumber", ...)` hybrid-interop
    /// payload that writers may add.
    NotationData,
    /// Anything else, named by its raw type byte.
    Unknown(u8),
}

impl SubpacketType {
    fn from_byte(b: u8) -> SubpacketType {
        match b {
            2 => SubpacketType::SignatureCreationTime,
            16 => SubpacketType::IssuerKeyId,
            20 => SubpacketType::NotationData,
            other => SubpacketType::Unknown(other),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            SubpacketType::SignatureCreationTime => 2,
            SubpacketType::IssuerKeyId => 16,
            SubpacketType::NotationData => 20,
            SubpacketType::Unknown(b) => b,
        }
    }
}

/// A single decoded subpacket.
#[derive(Debug, Clone)]
pub struct Subpacket {
    /// The subpacket's type.
    pub typ: SubpacketType,
    /// Whether the critical bit was set on the wire.
    pub critical: bool,
    /// The subpacket body, excluding the type byte.
    pub body: Vec<u8>,
}

impl Subpacket {
    /// Builds a `NotationData` subpacket carrying `name=value`, matching
    /// the `typeAndValue(name="issuerAndSerialNumber", value=iAndS)`
    /// convention writers may emit.
    pub fn notation(name: &str, value: &[u8]) -> Subpacket {
        let mut body = Vec::new();
        body.extend_from_slice(&(name.len() as u16).to_be_bytes());
        body.extend_from_slice(&(value.len() as u16).to_be_bytes());
        body.extend_from_slice(name.as_bytes());
        body.extend_from_slice(value);
        Subpacket {
            typ: SubpacketType::NotationData,
            critical: false,
            body,
        }
    }

    /// Builds an `IssuerKeyId` subpacket.
    pub fn issuer_key_id(key_id: [u8; 8]) -> Subpacket {
        Subpacket {
            typ: SubpacketType::IssuerKeyId,
            critical: false,
            body: key_id.to_vec(),
        }
    }

    /// Builds a `SignatureCreationTime` subpacket.
    pub fn signature_creation_time(unix_time: u32) -> Subpacket {
        Subpacket {
            typ: SubpacketType::SignatureCreationTime,
            critical: false,
            body: unix_time.to_be_bytes().to_vec(),
        }
    }
}

fn read_subpacket_length(c: &mut Cursor) -> Option<usize> {
    let b0 = c.read_byte()?;
    match b0 {
        0..=191 => Some(b0 as usize),
        192..=254 => {
            let b1 = c.read_byte()?;
            Some(((b0 as usize - 192) << 8) + b1 as usize + 192)
        }
        255 => c.uint32().map(|v| v as usize),
    }
}

fn write_subpacket_length(w: &mut Writer, len: usize) {
    if len < 192 {
        w.write_byte(len as u8);
    } else if len < 8384 {
        let v = len - 192;
        w.write_byte(((v >> 8) + 192) as u8);
        w.write_byte((v & 0xff) as u8);
    } else {
        w.write_byte(255);
        w.write_uint32(len as u32);
    }
}

/// Parses a subpacket area, enforcing the critical-bit rule: an unknown
/// subpacket with its critical bit set aborts the parse with
/// [`Error::NotAvail`]; other unknowns are kept (callers that don't care
/// about a given type simply ignore it) rather than silently lost.
pub fn parse(buf: &[u8]) -> Result<Vec<Subpacket>> {
    let mut c = Cursor::new(buf);
    let mut out = Vec::new();
    while c.remaining() > 0 {
        let len = read_subpacket_length(&mut c).ok_or(Error::Underflow)?;
        if len == 0 {
            return Err(Error::BadData("zero-length subpacket"));
        }
        let type_byte = c.read_byte().ok_or(Error::Underflow)?;
        let critical = type_byte & 0x80 != 0;
        let masked = type_byte & 0x7f;
        let body = c.read_exact(len - 1).ok_or(Error::Underflow)?.to_vec();

        if critical && masked > LAST_SUBPACKET {
            return Err(Error::NotAvail("unknown critical subpacket"));
        }
        out.push(Subpacket {
            typ: SubpacketType::from_byte(masked),
            critical,
            body,
        });
    }
    c.finish()?;
    Ok(out)
}

/// Serialises a subpacket area back to its wire form.
pub fn encode(subpackets: &[Subpacket]) -> Vec<u8> {
    let mut w = Writer::new();
    for sp in subpackets {
        let type_byte = sp.typ.to_byte() | if sp.critical { 0x80 } else { 0 };
        write_subpacket_length(&mut w, sp.body.len() + 1);
        w.write_byte(type_byte);
        w.write_bytes(&sp.body);
    }
    w.into_vec()
}

/// Looks up the first subpacket of a given type.
pub fn find(subpackets: &[Subpacket], typ: SubpacketType) -> Option<&Subpacket> {
    subpackets.iter().find(|sp| sp.typ == typ)
}

impl PartialEq for SubpacketType {
    fn eq(&self, other: &Self) -> bool {
        self.to_byte() == other.to_byte()
    }
}
impl Eq for SubpacketType {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_subpackets() {
        let subpackets = vec![
            Subpacket::signature_creation_time(1_700_000_000),
            Subpacket::issuer_key_id([1, 2, 3, 4, 5, 6, 7, 8]),
        ];
        let bytes = encode(&subpackets);
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            find(&parsed, SubpacketType::IssuerKeyId).unwrap().body,
            vec![1, 2, 3, 4, 5, 6, 7, 8]
        );
    }

    #[test]
    fn unknown_critical_subpacket_is_rejected() {
        let mut w = Writer::new();
        write_subpacket_length(&mut w, 2);
        w.write_byte(0x80 | 100);
        w.write_byte(0xaa);
        let bytes = w.into_vec();
        assert_eq!(parse(&bytes), Err(Error::NotAvail("unknown critical subpacket")));
    }

    #[test]
    fn unknown_noncritical_subpacket_is_kept() {
        let mut w = Writer::new();
        write_subpacket_length(&mut w, 2);
        w.write_byte(100);
        w.write_byte(0xaa);
        let bytes = w.into_vec();
        let parsed = parse(&bytes).unwrap();
        assert_eq!(parsed.len(), 1);
        assert!(matches!(parsed[0].typ, SubpacketType::Unknown(100)));
    }
}
