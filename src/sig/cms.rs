//! CMS `SignerInfo` (v1), with the signedAttributes re-tag hashing quirk
//! and the attribute-construction/messageDigest-check rules that go with
//! it.
//!
//! Grounded in spec.md §4.F:
//! ```text
//! SEQ { v1, iAndS, hashAlgoID,
//!       [0] signedAttributes?,      -- IMPLICIT SET
//!       sigAlgoID, OCTET STRING sig,
//!       [1] unsignedAttributes? }   -- IMPLICIT SET
//! ```
//! The signer hashes `{0x31}` followed by the stored attribute bytes
//! minus their leading tag octet — the `[0] IMPLICIT` tag is swapped for
//! a universal `SET OF` tag before hashing, even though the wire form
//! keeps the implicit tag.

use crate::context::KeyCtx;
use crate::cursor::{tag, Cursor, Writer};
use crate::derive;
use crate::oid;
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::sig::dlp;
use crate::{CryptAlgo, Error, HashAlgorithm, Result};
use digest::DynDigest;

/// `SignerInfo.version`.
pub const SIGNERINFO_VERSION: i64 = 1;
/// Cap on the encoded `signedAttributes` block.
pub const ENCODED_ATTRIBUTE_SIZE: usize = 512;
/// `signingTime` below this value is treated as "no reliable time
/// source" and omitted rather than written as a bogus `UTCTime`.
pub const MIN_TIME_VALUE: u32 = 0;

mod ctag {
    pub const SIGNED_ATTRS: u8 = 0;
    pub const UNSIGNED_ATTRS: u8 = 1;
}

/// Reads `SEQ { v1, iAndS, hashAlgoID, [0] signedAttributes?, sigAlgoID,
/// OCTET STRING sig, [1] unsignedAttributes? }`.
///
/// `attribute`/`unauth_attribute` carry the *full* TLV range (including
/// the `[0]`/`[1]` tag byte) rather than just the content, since the
/// signedAttributes hash needs that leading tag byte to perform the
/// substitution described above.
pub fn read(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let len = c.read_sequence().ok_or(Error::Underflow)?;
    let body_start = c.pos();
    let version = c.read_short_integer().ok_or(Error::Underflow)?;
    if version != SIGNERINFO_VERSION {
        return Err(Error::BadData("unexpected CMS SignerInfo version"));
    }
    let (ias_start, ias_len) = c.read_tlv_hole(tag::SEQUENCE).ok_or(Error::Underflow)?;
    let (hash_oid, _) = c.read_algo_id().ok_or(Error::Underflow)?;
    let hash_algo = oid::hash_algo_from_oid(hash_oid)?;

    let attribute = read_optional_tagged_range(&mut c, ctag::SIGNED_ATTRS)?;

    let (sig_oid, _) = c.read_algo_id().ok_or(Error::Underflow)?;
    let (crypt_algo, _) = oid::sig_algo_from_oid(sig_oid)?;
    let (data_start, data_len) = c.read_octet_string_hole().ok_or(Error::Underflow)?;

    let unauth_attribute = read_optional_tagged_range(&mut c, ctag::UNSIGNED_ATTRS)?;
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Cms),
        kind: Some(ObjectKind::Signature),
        version: version as u8,
        crypt_algo: Some(crypt_algo),
        hash_algo: Some(hash_algo),
        issuer_and_serial: Some(ias_start..ias_start + ias_len),
        attribute,
        unauth_attribute,
        data: Some(data_start..data_start + data_len),
        size: body_start + len,
        ..Default::default()
    })
}

fn read_optional_tagged_range(c: &mut Cursor, ctag_num: u8) -> Result<Option<std::ops::Range<usize>>> {
    if c.remaining() == 0 || c.peek_tag() != Some(tag::make_ctag(ctag_num)) {
        return Ok(None);
    }
    let tag_pos = c.pos();
    let content_len = c.read_constructed(tag::make_ctag(ctag_num)).ok_or(Error::Underflow)?;
    let content_start = c.pos();
    c.skip(content_len);
    if !c.ok() {
        return Err(Error::Underflow);
    }
    Ok(Some(tag_pos..content_start + content_len))
}

/// Returns the content octets of any TLV, skipping its own tag/length
/// header — used generically on both the `[0]`-tagged attribute block
/// and the individual `Attribute`/`AttributeValue` TLVs nested inside it.
fn tlv_content(tlv: &[u8]) -> Result<&[u8]> {
    let mut c = Cursor::new(tlv);
    let t = c.peek_tag().ok_or(Error::Underflow)?;
    let len = c.read_tlv_header(t).ok_or(Error::Underflow)?;
    c.read_exact(len).ok_or(Error::Underflow)
}

fn encode_attribute(oid_bytes: &[u8], value_tlv: &[u8]) -> Vec<u8> {
    let mut body = Writer::new();
    body.write_tlv(tag::OID, oid_bytes);
    body.write_tlv(tag::SET, value_tlv);
    let body = body.into_vec();
    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    w.into_vec()
}

fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719468;
    let era = if z >= 0 { z } else { z - 146096 } / 146097;
    let doe = (z - era * 146097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = if m <= 2 { y + 1 } else { y };
    (year, m, d)
}

/// Formats a Unix timestamp as a DER `UTCTime` value (`YYMMDDHHMMSSZ`).
fn unix_time_to_utctime(unix_time: u32) -> Vec<u8> {
    let days = (unix_time / 86400) as i64;
    let secs = unix_time % 86400;
    let (year, month, day) = civil_from_days(days);
    let hh = secs / 3600;
    let mm = (secs % 3600) / 60;
    let ss = secs % 60;
    format!(
        "{:02}{:02}{:02}{:02}{:02}{:02}Z",
        year.rem_euclid(100),
        month,
        day,
        hh,
        mm,
        ss
    )
    .into_bytes()
}

/// Builds the `[0] IMPLICIT SET` of signed attributes: `contentType`
/// (always `pkcs7-data`), `messageDigest` (always the live hash), and
/// `signingTime` when `signing_time` is past [`MIN_TIME_VALUE`].
pub fn build_signed_attributes(message_digest: &[u8], signing_time: Option<u32>) -> Result<Vec<u8>> {
    let mut oid_w = Writer::new();
    oid_w.write_tlv(tag::OID, oid::PKCS7_DATA);
    let content_type = encode_attribute(oid::CONTENT_TYPE, &oid_w.into_vec());

    let mut octet_w = Writer::new();
    octet_w.write_octet_string(message_digest);
    let message_digest_attr = encode_attribute(oid::MESSAGE_DIGEST, &octet_w.into_vec());

    let mut body = Vec::new();
    body.extend_from_slice(&content_type);
    body.extend_from_slice(&message_digest_attr);

    if let Some(t) = signing_time {
        if t > MIN_TIME_VALUE {
            let mut utc_w = Writer::new();
            utc_w.write_tlv(tag::UTC_TIME, &unix_time_to_utctime(t));
            let signing_time_attr = encode_attribute(oid::SIGNING_TIME, &utc_w.into_vec());
            body.extend_from_slice(&signing_time_attr);
        }
    }

    let mut w = Writer::new();
    w.write_tlv(tag::make_ctag(ctag::SIGNED_ATTRS), &body);
    let out = w.into_vec();
    if out.len() > ENCODED_ATTRIBUTE_SIZE {
        return Err(Error::Overflow);
    }
    Ok(out)
}

/// Hashes the signed-attributes block per the re-tag quirk: `0x31`
/// (universal `SET OF`) followed by `attr_tlv[1..]` (the stored length
/// and content octets, tag byte dropped).
pub fn hash_signed_attributes(hash_algo: HashAlgorithm, attr_tlv: &[u8]) -> Vec<u8> {
    let mut hasher = hash_algo.hasher();
    hasher.update(&[tag::SET]);
    hasher.update(&attr_tlv[1..]);
    hasher.finalize_reset().to_vec()
}

fn find_attribute_value<'a>(attr_set_body: &'a [u8], want_oid: &[u8]) -> Result<&'a [u8]> {
    let mut c = Cursor::new(attr_set_body);
    while c.remaining() > 0 {
        let seq_len = c.read_sequence().ok_or(Error::Underflow)?;
        let seq_start = c.pos();
        let oid_len = c.read_tlv_header(tag::OID).ok_or(Error::Underflow)?;
        let oid_bytes = c.read_exact(oid_len).ok_or(Error::Underflow)?;
        let set_len = c.read_tlv_header(tag::SET).ok_or(Error::Underflow)?;
        let value_start = c.pos();
        let value_tlv = c.sub_slice(value_start, set_len).ok_or(Error::Underflow)?;
        let matched = oid_bytes == want_oid;
        c.seek(seq_start + seq_len);
        if matched {
            return Ok(value_tlv);
        }
    }
    Err(Error::BadData("missing required signed attribute"))
}

/// DLP-aware sign: RSA pads the hash to a PKCS#1 block before
/// [`KeyCtx::sign`]; DSA signs the raw hash directly and re-encodes the
/// native `r ‖ s` result as the CMS `Dss-Sig-Value` DER form.
fn sign_attr_hash<R: rand_core::RngCore>(
    sign_ctx: &dyn KeyCtx,
    attr_hash: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    match sign_ctx.algorithm() {
        CryptAlgo::Rsa => {
            let padded = derive::pkcs1_wrap(attr_hash, sign_ctx.key_size(), rng)?;
            sign_ctx.sign(&padded)
        }
        CryptAlgo::Dsa => {
            let native = sign_ctx.sign(attr_hash)?;
            dlp::to_der(&native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for CMS signing")),
    }
}

fn verify_attr_hash(check_ctx: &dyn KeyCtx, attr_hash: &[u8], sig_bytes: &[u8]) -> Result<()> {
    match check_ctx.algorithm() {
        CryptAlgo::Rsa => check_ctx.verify(attr_hash, sig_bytes),
        CryptAlgo::Dsa => {
            let native = dlp::from_der(sig_bytes)?;
            check_ctx.verify(attr_hash, &native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for CMS verification")),
    }
}

/// Writes a `SignerInfo` with signed attributes attached (the common
/// S/MIME-style path).
pub fn write<R: rand_core::RngCore>(
    issuer_and_serial: &[u8],
    hash_algo: HashAlgorithm,
    message_digest: &[u8],
    signing_time: Option<u32>,
    sign_ctx: &dyn KeyCtx,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let attr_tlv = build_signed_attributes(message_digest, signing_time)?;
    let attr_hash = hash_signed_attributes(hash_algo, &attr_tlv);
    let sig = sign_attr_hash(sign_ctx, &attr_hash, rng)?;

    let hash_oid = oid::hash_algo_oid(hash_algo)?;
    let sig_oid = oid::sig_algo_oid(sign_ctx.algorithm(), hash_algo)?;

    let mut body = Writer::new();
    body.write_integer(SIGNERINFO_VERSION);
    body.write_bytes(issuer_and_serial);
    body.write_algo_id(hash_oid, None);
    body.write_bytes(&attr_tlv);
    body.write_algo_id(sig_oid, None);
    body.write_octet_string(&sig);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Writes a `SignerInfo` with no signed attributes, signing
/// `message_digest` directly — the bare CMS form some non-S/MIME
/// producers still emit.
pub fn write_bare<R: rand_core::RngCore>(
    issuer_and_serial: &[u8],
    hash_algo: HashAlgorithm,
    message_digest: &[u8],
    sign_ctx: &dyn KeyCtx,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let sig = sign_attr_hash(sign_ctx, message_digest, rng)?;
    let hash_oid = oid::hash_algo_oid(hash_algo)?;
    let sig_oid = oid::sig_algo_oid(sign_ctx.algorithm(), hash_algo)?;

    let mut body = Writer::new();
    body.write_integer(SIGNERINFO_VERSION);
    body.write_bytes(issuer_and_serial);
    body.write_algo_id(hash_oid, None);
    body.write_algo_id(sig_oid, None);
    body.write_octet_string(&sig);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Verifies a `SignerInfo`. If signed attributes are present, the
/// embedded `messageDigest` is checked against `message_digest` *before*
/// the signature itself is verified — a mismatch is [`Error::SignatureError`]
/// and the attribute set is never handed back to the caller, matching
/// the ordering rule that a failed digest check must not release
/// attributes.
pub fn verify(buf: &[u8], check_ctx: &dyn KeyCtx, message_digest: &[u8]) -> Result<QueryInfo> {
    let info = read(buf)?;
    let sig_range = info.data.clone().ok_or(Error::Underflow)?;
    let sig_bytes = &buf[sig_range];

    let digest_to_verify = match &info.attribute {
        Some(range) => {
            let attr_tlv = &buf[range.clone()];
            let content = tlv_content(attr_tlv)?;
            let embedded = find_attribute_value(content, oid::MESSAGE_DIGEST)?;
            let embedded_digest = tlv_content(embedded)?;
            if embedded_digest != message_digest {
                return Err(Error::SignatureError);
            }
            let hash_algo = info.hash_algo.ok_or(Error::BadData("missing hash algorithm"))?;
            hash_signed_attributes(hash_algo, attr_tlv)
        }
        None => message_digest.to_vec(),
    };

    verify_attr_hash(check_ctx, &digest_to_verify, sig_bytes)?;
    Ok(info)
}

/// Computes the countersignature (timestamp) imprint: the live hash of
/// the signature value's `OCTET STRING` content octets. This is the
/// CMS-correct variant; the alternative "hash the whole `SignerInfo`"
/// behaviour some implementations shipped during a bug-fix window is
/// not reproduced.
pub fn countersignature_imprint(hash_algo: HashAlgorithm, signature_value: &[u8]) -> Vec<u8> {
    let mut hasher = hash_algo.hasher();
    hasher.update(signature_value);
    hasher.finalize_reset().to_vec()
}
