//! Cryptlib's extended signature format: adds an explicit key id so the
//! verifier can reject a wrong-key signature before running the
//! primitive at all.
//!
//! Grounded in spec.md §4.F: `SEQ { v3, [0] OCTET STRING keyID,
//! hashAlgoID, sigAlgoID, OCTET STRING sig }`.

use crate::context::{CompareMode, KeyCtx};
use crate::cursor::{tag, Cursor, Writer};
use crate::derive;
use crate::oid;
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::{Error, HashAlgorithm, Result};

/// `SignatureEx.version`.
pub const SIGNATURE_EX_VERSION: i64 = 3;

/// Reads `SEQ { v3, [0] OCTET STRING keyID, hashAlgoID, sigAlgoID, OCTET STRING sig }`.
pub fn read(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let len = c.read_sequence().ok_or(Error::Underflow)?;
    let body_start = c.pos();
    let version = c.read_short_integer().ok_or(Error::Underflow)?;
    if version != SIGNATURE_EX_VERSION {
        return Err(Error::BadData("unexpected cryptlib signature version"));
    }
    let key_id_len = c
        .read_constructed(tag::make_ctag_primitive(0))
        .ok_or(Error::Underflow)?;
    let key_id = c.read_exact(key_id_len).ok_or(Error::Underflow)?.to_vec();
    let (hash_oid, _) = c.read_algo_id().ok_or(Error::Underflow)?;
    let hash_algo = oid::hash_algo_from_oid(hash_oid)?;
    let (sig_oid, _) = c.read_algo_id().ok_or(Error::Underflow)?;
    let (crypt_algo, _) = oid::sig_algo_from_oid(sig_oid)?;
    let (data_start, data_len) = c.read_octet_string_hole().ok_or(Error::Underflow)?;
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Cryptlib),
        kind: Some(ObjectKind::Signature),
        version: version as u8,
        crypt_algo: Some(crypt_algo),
        hash_algo: Some(hash_algo),
        key_id,
        data: Some(data_start..data_start + data_len),
        size: body_start + len,
        ..Default::default()
    })
}

/// Writes the cryptlib extended signature form. `key_id` must be checked
/// by the verifier via [`KeyCtx::compare`] with [`CompareMode::KeyId`]
/// before the primitive runs — a mismatch is [`Error::WrongKey`], not a
/// failed signature check. `hash` is the raw digest; this function pads
/// it to a PKCS#1 v1.5 block before handing it to
/// [`KeyCtx::sign`], which operates on the padded block directly.
pub fn write<R: rand_core::RngCore>(
    key_id: &[u8],
    hash_algo: HashAlgorithm,
    sign_ctx: &dyn KeyCtx,
    hash: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    let padded = derive::pkcs1_wrap(hash, sign_ctx.key_size(), rng)?;
    let sig = sign_ctx.sign(&padded)?;
    let hash_oid = oid::hash_algo_oid(hash_algo)?;
    let sig_oid = oid::sig_algo_oid(sign_ctx.algorithm(), hash_algo)?;

    let mut body = Writer::new();
    body.write_integer(SIGNATURE_EX_VERSION);
    body.write_tlv(tag::make_ctag_primitive(0), key_id);
    body.write_algo_id(hash_oid, None);
    body.write_algo_id(sig_oid, None);
    body.write_octet_string(&sig);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Verifies a cryptlib signature, checking the embedded key id first.
pub fn check(buf: &[u8], check_ctx: &dyn KeyCtx, hash: &[u8]) -> Result<()> {
    let info = read(buf)?;
    check_ctx
        .compare(CompareMode::KeyId, &info.key_id)
        .map_err(|_| Error::WrongKey)?;
    let range = info.data.ok_or(Error::Underflow)?;
    check_ctx.verify(hash, &buf[range])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::RsaContext;
    use rsa::RsaPrivateKey;

    #[test]
    fn round_trip() {
        let mut keygen_rng = rand::rngs::mock::StepRng::new(0x55aa, 0x1001);
        let private = RsaPrivateKey::new(&mut keygen_rng, 1024).unwrap();
        let public = private.to_public_key();
        let sign_ctx = RsaContext::from_private(private);
        let check_ctx = RsaContext::from_public(public);

        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let hash = [0x11u8; 20];
        let key_id = [0x42u8; 8];
        let bytes = write(&key_id, HashAlgorithm::Sha1, &sign_ctx, &hash, &mut rng).unwrap();
        check(&bytes, &check_ctx, &hash).unwrap();
    }

    #[test]
    fn wrong_key_id_rejected_before_verify() {
        let mut keygen_rng = rand::rngs::mock::StepRng::new(0x55aa, 0x1001);
        let private = RsaPrivateKey::new(&mut keygen_rng, 1024).unwrap();
        let public = private.to_public_key();
        let sign_ctx = RsaContext::from_private(private);
        let check_ctx = RsaContext::from_public(public);

        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let hash = [0x11u8; 20];
        let bytes = write(&[0xffu8; 8], HashAlgorithm::Sha1, &sign_ctx, &hash, &mut rng).unwrap();
        let err = check(&bytes, &check_ctx, &hash).unwrap_err();
        assert_eq!(err, Error::WrongKey);
    }
}
