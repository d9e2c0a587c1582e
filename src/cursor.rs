//! Positional byte-stream reader and writer.
//!
//! `Cursor` walks a borrowed buffer without ever panicking on malformed
//! input: once a read runs past the end or hits a structurally invalid TLV,
//! it poisons itself and every subsequent operation becomes a no-op that
//! keeps returning the same error. Callers check `ok()` (or let `finish()`
//! surface it) instead of threading a `Result` through every helper.

use crate::{Error, Result};

/// Implementation-defined minimum length of any object this crate parses.
pub const MIN_CRYPT_OBJECTSIZE: usize = 16;
/// Ceiling on any keying-iteration count read from the wire.
pub const MAX_KEYSETUP_ITERATIONS: usize = 20_000;
pub const MAX_HASHSIZE: usize = 64;
pub const MAX_IVSIZE: usize = 16;

pub fn bits_to_bytes(bits: usize) -> usize {
    (bits + 7) / 8
}

pub fn round_up(n: usize, to: usize) -> usize {
    (n + to - 1) / to * to
}

/// ASN.1 universal/constructed tag bytes this crate needs to recognise.
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTC_TIME: u8 = 0x17;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;

    pub const fn make_ctag(n: u8) -> u8 {
        0xa0 | n
    }
    pub const fn make_ctag_primitive(n: u8) -> u8 {
        0x80 | n
    }
}

/// A mutable, borrowing cursor over a byte slice.
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    poisoned: Option<Error>,
}

impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Cursor {
            buf,
            pos: 0,
            poisoned: None,
        }
    }

    pub fn ok(&self) -> bool {
        self.poisoned.is_none()
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    pub fn seek(&mut self, pos: usize) {
        if self.poisoned.is_some() {
            return;
        }
        if pos > self.buf.len() {
            self.set_error(Error::Underflow);
        } else {
            self.pos = pos;
        }
    }

    pub fn set_error(&mut self, err: Error) {
        if self.poisoned.is_none() {
            self.poisoned = Some(err);
        }
    }

    /// Clears the poisoned flag and resets to `pos`. Used only by the one
    /// legitimate retry in this crate (CMS PWRI legacy-vs-modern detection).
    pub fn clear_error_and_seek(&mut self, pos: usize) {
        self.poisoned = None;
        self.pos = pos.min(self.buf.len());
    }

    pub fn finish(&self) -> Result<()> {
        match &self.poisoned {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn require(&mut self, n: usize) -> bool {
        if self.poisoned.is_some() {
            return false;
        }
        if self.remaining() < n {
            self.set_error(Error::Underflow);
            return false;
        }
        true
    }

    pub fn peek_byte(&mut self) -> Option<u8> {
        if !self.require(1) {
            return None;
        }
        Some(self.buf[self.pos])
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        let b = self.peek_byte()?;
        self.pos += 1;
        Some(b)
    }

    pub fn read_exact(&mut self, n: usize) -> Option<&'a [u8]> {
        if !self.require(n) {
            return None;
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(s)
    }

    pub fn skip(&mut self, n: usize) {
        if self.require(n) {
            self.pos += n;
        }
    }

    pub fn sub_slice(&self, start: usize, len: usize) -> Option<&'a [u8]> {
        if start.checked_add(len)? > self.buf.len() {
            return None;
        }
        Some(&self.buf[start..start + len])
    }

    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    // -- ASN.1 helpers -------------------------------------------------

    /// Reads a BER/DER length octet sequence, tolerating both short and
    /// long forms. Returns the decoded length.
    fn read_length(&mut self) -> Option<usize> {
        let first = self.read_byte()?;
        if first & 0x80 == 0 {
            return Some(first as usize);
        }
        let n_octets = (first & 0x7f) as usize;
        if n_octets == 0 || n_octets > 4 {
            self.set_error(Error::BadData("bad ASN.1 length octet"));
            return None;
        }
        let bytes = self.read_exact(n_octets)?;
        let mut len = 0usize;
        for &b in bytes {
            len = (len << 8) | b as usize;
        }
        Some(len)
    }

    /// Reads a tag byte and its length, checking the tag matches `expect`.
    pub fn read_tlv_header(&mut self, expect: u8) -> Option<usize> {
        let tag = self.read_byte()?;
        if tag != expect {
            self.set_error(Error::BadData("unexpected ASN.1 tag"));
            return None;
        }
        self.read_length()
    }

    pub fn peek_tag(&mut self) -> Option<u8> {
        self.peek_byte()
    }

    /// Reads a `SEQUENCE` header, returning the content length.
    pub fn read_sequence(&mut self) -> Option<usize> {
        self.read_tlv_header(tag::SEQUENCE)
    }

    /// Like `read_sequence` but tolerates an indefinite/long BER length by
    /// simply trusting whatever `read_length` decoded (DER-only is strict;
    /// BER callers just want the nominal length to bound sub-parses).
    pub fn read_long_sequence(&mut self) -> Option<usize> {
        self.read_sequence()
    }

    pub fn read_constructed(&mut self, ctag: u8) -> Option<usize> {
        self.read_tlv_header(ctag)
    }

    pub fn read_short_integer(&mut self) -> Option<i64> {
        let len = self.read_tlv_header(tag::INTEGER)?;
        if len == 0 || len > 8 {
            self.set_error(Error::BadData("integer too large"));
            return None;
        }
        let bytes = self.read_exact(len)?;
        let mut v: i64 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &b in bytes {
            v = (v << 8) | b as i64;
        }
        Some(v)
    }

    pub fn read_octet_string(&mut self) -> Option<&'a [u8]> {
        let len = self.read_tlv_header(tag::OCTET_STRING)?;
        self.read_exact(len)
    }

    /// Reads an OCTET STRING but only returns its byte range, leaving the
    /// contents unread by value — used when the caller only needs offsets
    /// into the original buffer (e.g. signature payload ranges).
    pub fn read_octet_string_hole(&mut self) -> Option<(usize, usize)> {
        self.read_tlv_hole(tag::OCTET_STRING)
    }

    /// Reads any TLV matching `expect`, returning the byte range of its
    /// *content* (not including the tag/length octets) without copying —
    /// used for fields this crate only needs to carry as an offset/length
    /// pair (`issuerAndSerialNumber`, signed/unsigned attribute sets).
    pub fn read_tlv_hole(&mut self, expect: u8) -> Option<(usize, usize)> {
        let len = self.read_tlv_header(expect)?;
        let start = self.pos;
        self.skip(len);
        if !self.ok() {
            return None;
        }
        Some((start, len))
    }

    pub fn read_fixed_oid(&mut self, oid: &[u8]) -> bool {
        let Some(len) = self.read_tlv_header(tag::OID) else {
            return false;
        };
        let Some(bytes) = self.read_exact(len) else {
            return false;
        };
        if bytes != oid {
            self.set_error(Error::BadData("OID mismatch"));
            return false;
        }
        true
    }

    /// Reads `AlgorithmIdentifier ::= SEQUENCE { algorithm OID, parameters ANY OPTIONAL }`,
    /// returning the raw OID bytes and the remaining parameter bytes.
    pub fn read_algo_id(&mut self) -> Option<(&'a [u8], &'a [u8])> {
        let seq_len = self.read_sequence()?;
        let seq_start = self.pos;
        let oid_len = self.read_tlv_header(tag::OID)?;
        let oid = self.read_exact(oid_len)?;
        let consumed = self.pos - seq_start;
        if consumed > seq_len {
            self.set_error(Error::BadData("AlgorithmIdentifier length mismatch"));
            return None;
        }
        let params_len = seq_len - consumed;
        let params = self.read_exact(params_len)?;
        Some((oid, params))
    }

    /// Extended variant that also reports whether a `NULL` parameters field
    /// was present (common for RSA/hash algorithm identifiers).
    pub fn read_algo_id_ex(&mut self) -> Option<(&'a [u8], &'a [u8], bool)> {
        let (oid, params) = self.read_algo_id()?;
        let is_null = params.len() == 2 && params[0] == tag::NULL && params[1] == 0;
        Some((oid, params, is_null))
    }

    /// Skips a single TLV of any tag/length without interpreting its value.
    pub fn read_universal(&mut self) -> bool {
        let Some(_tag) = self.read_byte() else {
            return false;
        };
        let Some(len) = self.read_length() else {
            return false;
        };
        self.skip(len);
        self.ok()
    }

    // -- PGP helpers -----------------------------------------------------

    /// Reads an old- or new-format packet header, returning `(tag, body_len)`.
    pub fn read_packet_header(&mut self) -> Option<(u8, usize)> {
        let ctb = self.read_byte()?;
        if ctb & 0x80 == 0 {
            self.set_error(Error::BadData("packet tag bit not set"));
            return None;
        }
        if ctb & 0x40 != 0 {
            // New format: tag in low 6 bits, length is "short_length" style.
            let ptag = ctb & 0x3f;
            let len = self.read_new_length()?;
            Some((ptag, len))
        } else {
            let ptag = (ctb >> 2) & 0x0f;
            let len_type = ctb & 0x03;
            let len = match len_type {
                0 => self.read_byte()? as usize,
                1 => self.uint16()? as usize,
                2 => self.uint32()? as usize,
                _ => {
                    self.set_error(Error::NotAvail("reserved PGP packet length type"));
                    return None;
                }
            };
            Some((ptag, len))
        }
    }

    fn read_new_length(&mut self) -> Option<usize> {
        let b0 = self.read_byte()?;
        match b0 {
            0..=191 => Some(b0 as usize),
            192..=223 => {
                let b1 = self.read_byte()?;
                Some(((b0 as usize - 192) << 8) + b1 as usize + 192)
            }
            255 => {
                let v = self.uint32()?;
                Some(v as usize)
            }
            _ => {
                // Partial body lengths (224..=254) are not used by any
                // packet type this crate reads.
                self.set_error(Error::NotAvail("partial-length PGP packet"));
                None
            }
        }
    }

    pub fn uint16(&mut self) -> Option<u16> {
        let b = self.read_exact(2)?;
        Some(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn uint32(&mut self) -> Option<u32> {
        let b = self.read_exact(4)?;
        Some(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads an OpenPGP MPI: a 2-byte bit length followed by the minimal
    /// big-endian byte encoding. Returns the bit length and the byte slice.
    pub fn read_mpi(&mut self) -> Option<(u16, &'a [u8])> {
        let bits = self.uint16()?;
        let bytes = bits_to_bytes(bits as usize);
        let data = self.read_exact(bytes)?;
        Some((bits, data))
    }
}

/// An append-only byte sink with the write-direction counterparts of
/// `Cursor`'s helpers. In "probe" mode (`Writer::probe()`) nothing is
/// buffered; only the length accumulates, letting codecs share one body
/// between `encoded_len()` and `encode_into()`.
pub struct Writer {
    buf: Option<Vec<u8>>,
    len: usize,
}

impl Writer {
    pub fn new() -> Self {
        Writer {
            buf: Some(Vec::new()),
            len: 0,
        }
    }

    pub fn probe() -> Self {
        Writer { buf: None, len: 0 }
    }

    pub fn is_probe(&self) -> bool {
        self.buf.is_none()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.buf.unwrap_or_default()
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.len += data.len();
        if let Some(buf) = &mut self.buf {
            buf.extend_from_slice(data);
        }
    }

    pub fn write_byte(&mut self, b: u8) {
        self.write_bytes(&[b]);
    }

    fn encode_length(len: usize) -> Vec<u8> {
        if len < 0x80 {
            vec![len as u8]
        } else {
            let bytes = len.to_be_bytes();
            let significant: Vec<u8> = bytes
                .iter()
                .copied()
                .skip_while(|&b| b == 0)
                .collect();
            let mut out = vec![0x80 | significant.len() as u8];
            out.extend_from_slice(&significant);
            out
        }
    }

    pub fn write_tlv(&mut self, tag: u8, content: &[u8]) {
        self.write_byte(tag);
        self.write_bytes(&Self::encode_length(content.len()));
        self.write_bytes(content);
    }

    pub fn write_sequence_header(&mut self, content_len: usize) {
        self.write_byte(tag::SEQUENCE);
        self.write_bytes(&Self::encode_length(content_len));
    }

    pub fn write_octet_string(&mut self, content: &[u8]) {
        self.write_tlv(tag::OCTET_STRING, content);
    }

    pub fn write_integer(&mut self, v: i64) {
        let mut bytes = v.to_be_bytes().to_vec();
        while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
            bytes.remove(0);
        }
        self.write_tlv(tag::INTEGER, &bytes);
    }

    pub fn write_algo_id(&mut self, oid: &[u8], params: Option<&[u8]>) {
        let mut body = Writer::new();
        body.write_tlv(tag::OID, oid);
        match params {
            Some(p) => body.write_bytes(p),
            None => body.write_tlv(tag::NULL, &[]),
        }
        let body = body.into_vec();
        self.write_sequence_header(body.len());
        self.write_bytes(&body);
    }

    // -- PGP write helpers ------------------------------------------------

    pub fn write_packet_header(&mut self, ptag: u8, len: usize) {
        self.write_byte(0xc0 | ptag);
        self.write_short_length(len);
    }

    pub fn write_short_length(&mut self, len: usize) {
        if len < 192 {
            self.write_byte(len as u8);
        } else if len < 8384 {
            let v = len - 192;
            self.write_byte(((v >> 8) + 192) as u8);
            self.write_byte((v & 0xff) as u8);
        } else {
            self.write_byte(255);
            self.write_uint32(len as u32);
        }
    }

    pub fn write_uint16(&mut self, v: u16) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_uint32(&mut self, v: u32) {
        self.write_bytes(&v.to_be_bytes());
    }

    pub fn write_mpi(&mut self, bytes: &[u8]) {
        let bytes = strip_leading_zeros(bytes);
        let bits = mpi_bit_length(bytes);
        self.write_uint16(bits);
        self.write_bytes(bytes);
    }
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < bytes.len().saturating_sub(1) && bytes[i] == 0 {
        i += 1;
    }
    if bytes.is_empty() {
        bytes
    } else {
        &bytes[i..]
    }
}

fn mpi_bit_length(bytes: &[u8]) -> u16 {
    if bytes.is_empty() || (bytes.len() == 1 && bytes[0] == 0) {
        return 0;
    }
    let top = bytes[0];
    let extra_bits = 8 - top.leading_zeros() as usize;
    ((bytes.len() - 1) * 8 + extra_bits) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_round_trip() {
        let mut w = Writer::new();
        w.write_sequence_header(3);
        w.write_bytes(&[1, 2, 3]);
        let bytes = w.into_vec();
        let mut c = Cursor::new(&bytes);
        let len = c.read_sequence().unwrap();
        assert_eq!(len, 3);
        assert_eq!(c.read_exact(3).unwrap(), &[1, 2, 3]);
    }

    #[test]
    fn long_length_round_trip() {
        let content = vec![0xabu8; 300];
        let mut w = Writer::new();
        w.write_octet_string(&content);
        let bytes = w.into_vec();
        let mut c = Cursor::new(&bytes);
        assert_eq!(c.read_octet_string().unwrap(), &content[..]);
    }

    #[test]
    fn mpi_bit_length_matches_spec() {
        let mut w = Writer::new();
        w.write_mpi(&[0x01, 0xff]);
        let bytes = w.into_vec();
        assert_eq!(&bytes[0..2], &[0x00, 0x09]);
    }

    #[test]
    fn poisoned_cursor_stays_poisoned() {
        let buf = [0x30, 0x05, 1, 2, 3];
        let mut c = Cursor::new(&buf);
        assert!(c.read_sequence().is_some());
        assert!(c.read_exact(10).is_none());
        assert!(!c.ok());
        assert!(c.read_byte().is_none());
    }

    #[test]
    fn new_format_packet_header() {
        let buf = [0xc3u8, 0x04, 0xaa, 0xbb, 0xcc, 0xdd];
        let mut c = Cursor::new(&buf);
        let (tag, len) = c.read_packet_header().unwrap();
        assert_eq!(tag, 3);
        assert_eq!(len, 4);
    }

    // An MPI always round-trips to its minimal (leading-zero-stripped)
    // byte encoding, regardless of what leading zeros the input carried.
    quickcheck! {
        fn mpi_round_trips_to_minimal_encoding(bytes: Vec<u8>) -> bool {
            let mut w = Writer::new();
            w.write_mpi(&bytes);
            let out = w.into_vec();
            let mut c = Cursor::new(&out);
            let (_bits, data) = match c.read_mpi() {
                Some(v) => v,
                None => return false,
            };
            data == strip_leading_zeros(&bytes)
        }
    }
}
