//! Cryptlib's extended KeyTrans (v3): adds an explicit key id field so the
//! importer can select the right private key without first having to
//! parse a whole certificate chain's `issuerAndSerialNumber`.
//!
//! Grounded in spec.md §4.E: `SEQ { INTEGER 2, [0] OCTET STRING keyID,
//! AlgorithmIdentifier, OCTET STRING }`.

use crate::context::KeyCtx;
use crate::cursor::{tag, Cursor, Writer};
use crate::derive;
use crate::oid;
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::{Error, Result};

/// `KeyTransRecipientInfo.version` for the cryptlib extended form.
pub const KEYTRANS_EX_VERSION: i64 = 2;

/// Reads `SEQ { INTEGER 2, [0] OCTET STRING keyID, AlgorithmIdentifier, OCTET STRING }`.
pub fn read_keytrans(buf: &[u8]) -> Result<QueryInfo> {
    let mut c = Cursor::new(buf);
    let len = c.read_sequence().ok_or(Error::Underflow)?;
    let body_start = c.pos();
    let version = c.read_short_integer().ok_or(Error::Underflow)?;
    if version != KEYTRANS_EX_VERSION {
        return Err(Error::BadData("unexpected cryptlib KeyTrans version"));
    }
    let key_id_len = c
        .read_constructed(tag::make_ctag_primitive(0))
        .ok_or(Error::Underflow)?;
    let key_id = c.read_exact(key_id_len).ok_or(Error::Underflow)?.to_vec();
    let (algo_oid, _params) = c.read_algo_id().ok_or(Error::Underflow)?;
    let crypt_algo = oid::pkc_algo_from_oid(algo_oid)?;
    let (data_start, data_len) = c.read_octet_string_hole().ok_or(Error::Underflow)?;
    c.finish()?;

    Ok(QueryInfo {
        format: Some(Format::Cryptlib),
        kind: Some(ObjectKind::PkcEncryptedKey),
        version: version as u8,
        crypt_algo: Some(crypt_algo),
        key_id,
        data: Some(data_start..data_start + data_len),
        size: body_start + len,
        ..Default::default()
    })
}

/// Writes the cryptlib extended KeyTrans form. `key_id` is compared by the
/// importer (see [`crate::context::KeyCtx::compare`] with
/// [`crate::context::CompareMode::KeyId`]) before any decryption is
/// attempted, so a wrapped-for-the-wrong-key blob is rejected as
/// [`Error::WrongKey`] rather than silently corrupted.
pub fn write_keytrans<R: rand_core::RngCore>(
    session_key: &[u8],
    key_id: &[u8],
    wrap_ctx: &dyn KeyCtx,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let padded = derive::pkcs1_wrap(session_key, wrap_ctx.key_size(), rng)?;
    let encrypted = wrap_ctx.raw_public(&padded)?;
    let algo_oid = oid::pkc_algo_oid(wrap_ctx.algorithm())?;

    let mut body = Writer::new();
    body.write_integer(KEYTRANS_EX_VERSION);
    body.write_tlv(tag::make_ctag_primitive(0), key_id);
    body.write_algo_id(algo_oid, None);
    body.write_octet_string(&encrypted);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_sequence_header(body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{CompareMode, KeyCtx as _};
    use crate::provider::RsaContext;
    use rsa::{RsaPrivateKey, RsaPublicKey};

    fn test_rsa_key() -> RsaPrivateKey {
        let mut rng = rand::rngs::mock::StepRng::new(0x2468_1357, 0x1111_2222);
        RsaPrivateKey::new(&mut rng, 1024).expect("key generation")
    }

    #[test]
    fn wrong_key_id_is_detected_before_decryption() {
        let private_a = test_rsa_key();
        let public_a: RsaPublicKey = private_a.to_public_key();
        let wrap_ctx = RsaContext::from_public(public_a);

        let private_b = test_rsa_key();
        let unwrap_ctx = RsaContext::from_private(private_b);

        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let session_key = [0x55u8; 16];
        let key_id_a = [0xaau8; 8];
        let wrapped = write_keytrans(&session_key, &key_id_a, &wrap_ctx, &mut rng).unwrap();
        let info = read_keytrans(&wrapped).unwrap();

        let err = unwrap_ctx.compare(CompareMode::KeyId, &info.key_id).unwrap_err();
        assert_eq!(err, Error::WrongKey);
    }

    #[test]
    fn keytrans_ex_round_trip() {
        let private = test_rsa_key();
        let public: RsaPublicKey = private.to_public_key();
        let wrap_ctx = RsaContext::from_public(public);
        let unwrap_ctx = RsaContext::from_private(private);

        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let session_key = [0x66u8; 16];
        let key_id = [0xbbu8; 8];
        let wrapped = write_keytrans(&session_key, &key_id, &wrap_ctx, &mut rng).unwrap();
        let info = read_keytrans(&wrapped).unwrap();
        assert_eq!(info.key_id, key_id);
        let (start, len) = (info.data.as_ref().unwrap().start, info.data.as_ref().unwrap().len());
        let padded = unwrap_ctx.raw_private(&wrapped[start..start + len]).unwrap();
        let recovered = derive::pkcs1_unwrap(&padded).unwrap();
        assert_eq!(recovered, session_key);
    }
}
