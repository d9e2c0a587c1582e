//! OpenPGP signatures: the one-pass header that precedes a signed
//! message body, the v4 signature packet itself, and the trailer-hashing
//! convention that ties the two together.
//!
//! Grounded in spec.md §4.F. The hash a v4 signature actually verifies is
//! not just the message digest: after the message body, the packet's
//! own `version, sigType, sigAlgo, hashAlgo, authAttrLen, authAttrs`
//! bytes are fed back into the same running hash, followed by a trailer
//! `04 FF <be32 length-of-that-run>`; only then is the hash finalised.
//! [`finalize_signature_hash`] is the one place that replay happens, so
//! [`write_signature`] and [`check`] can't drift apart on it.

use crate::algorithm::{CryptAlgo, HashAlgorithm};
use crate::context::{HashCtx, KeyCtx};
use crate::cursor::{Cursor, Writer};
use crate::query::{Format, ObjectKind, QueryInfo};
use crate::sig::dlp;
use crate::subpacket::{self, Subpacket, SubpacketType};
use crate::{derive, Error, Result};

mod pgp_tag {
    pub const SIGNATURE: u8 = 2;
    pub const ONEPASS_SIG: u8 = 4;
}

/// The version this crate always writes and requires on read for the
/// main signature packet (OpenPGP v4).
pub const VERSION: u8 = 4;
/// The one-pass-signature packet's own version field — a separate
/// counter from the signature packet it precedes, and still 3 even
/// though it always announces a v4 signature.
pub const ONEPASS_VERSION: u8 = 3;

/// Size in bytes of the interoperability-only hash-check field.
pub const HASH_CHECK_SIZE: usize = 2;

/// The DSA hash-input size this crate's signing layer is constrained to,
/// independent of which hash algorithm produced the full digest (see
/// [`crate::sig::dlp::DLP_COMPONENT_SIZE`]).
const DSA_HASH_INPUT_SIZE: usize = 20;

/// Decoded fields of a one-pass-signature header packet (tag 4). Exists
/// only to announce a following signature packet's parameters before the
/// signed data is read; this crate never itself nests one-pass headers.
pub struct OnePassSig {
    /// Signature type byte (binary, canonical text, ...).
    pub sig_type: u8,
    /// The hash algorithm the signature will use.
    pub hash_algo: HashAlgorithm,
    /// The signing algorithm the signature will use.
    pub sig_algo: CryptAlgo,
    /// The signer's key id.
    pub key_id: [u8; 8],
    /// Whether this is the innermost one-pass header in a nested series
    /// (the wire's "this is not followed by another one-pass packet for
    /// the same literal data" flag).
    pub last: bool,
}

/// Reads a one-pass-signature packet (tag 4).
pub fn read_onepass_sig(buf: &[u8]) -> Result<OnePassSig> {
    let mut c = Cursor::new(buf);
    let (ptag, _body_len) = c.read_packet_header().ok_or(Error::Underflow)?;
    if ptag != pgp_tag::ONEPASS_SIG {
        return Err(Error::BadData("not a one-pass signature packet"));
    }
    let version = c.read_byte().ok_or(Error::Underflow)?;
    if version != ONEPASS_VERSION {
        return Err(Error::NotAvail("unsupported one-pass signature version"));
    }
    let sig_type = c.read_byte().ok_or(Error::Underflow)?;
    let hash_algo = HashAlgorithm::from_pgp(c.read_byte().ok_or(Error::Underflow)?)?;
    let sig_algo = CryptAlgo::from_pgp_public(c.read_byte().ok_or(Error::Underflow)?)?;
    let key_id_bytes = c.read_exact(8).ok_or(Error::Underflow)?;
    let mut key_id = [0u8; 8];
    key_id.copy_from_slice(key_id_bytes);
    let last = c.read_byte().ok_or(Error::Underflow)? != 0;
    c.finish()?;
    Ok(OnePassSig { sig_type, hash_algo, sig_algo, key_id, last })
}

/// Writes a one-pass-signature packet announcing the signature
/// [`write_signature`] is about to produce.
pub fn write_onepass_sig(
    sig_type: u8,
    hash_algo: HashAlgorithm,
    sig_algo: CryptAlgo,
    key_id: [u8; 8],
    last: bool,
) -> Result<Vec<u8>> {
    let mut body = Writer::new();
    body.write_byte(ONEPASS_VERSION);
    body.write_byte(sig_type);
    body.write_byte(hash_algo.to_pgp());
    body.write_byte(sig_algo.to_pgp_public()?);
    body.write_bytes(&key_id);
    body.write_byte(if last { 1 } else { 0 });
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_packet_header(pgp_tag::ONEPASS_SIG, body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Runs the v4 trailer-hashing protocol against an in-progress hash that
/// has already consumed the signed message body: feeds the packet's own
/// `version, sigType, sigAlgo, hashAlgo, authAttrLen, authAttrs` bytes,
/// then the `04 FF <be32 len>` trailer, then finalises. `auth_attrs` is
/// the encoded authenticated-subpacket area (the bytes actually on the
/// wire, not including its own `uint16` length prefix — that's added
/// here so read and write can't disagree on it).
pub fn finalize_signature_hash(
    mut hasher: Box<dyn HashCtx>,
    sig_type: u8,
    sig_algo: CryptAlgo,
    hash_algo: HashAlgorithm,
    auth_attrs: &[u8],
) -> Result<Vec<u8>> {
    let mut prefix = Writer::new();
    prefix.write_byte(VERSION);
    prefix.write_byte(sig_type);
    prefix.write_byte(sig_algo.to_pgp_public()?);
    prefix.write_byte(hash_algo.to_pgp());
    prefix.write_uint16(auth_attrs.len() as u16);
    let prefix = prefix.into_vec();

    hasher.update(&prefix);
    hasher.update(auth_attrs);
    let hashed_len = prefix.len() + auth_attrs.len();

    let mut trailer = Writer::new();
    trailer.write_byte(VERSION);
    trailer.write_byte(0xff);
    trailer.write_uint32(hashed_len as u32);
    hasher.update(&trailer.into_vec());

    Ok(hasher.finalize())
}

fn dsa_hash_input(digest: &[u8]) -> &[u8] {
    &digest[..DSA_HASH_INPUT_SIZE.min(digest.len())]
}

/// DLP-aware sign over an already-computed (post-trailer) digest: RSA
/// pads it to a PKCS#1 block before [`KeyCtx::sign`] and wraps the raw
/// signature value as a single MPI; DSA truncates the digest to the
/// 160-bit block DSA is constrained to and re-encodes the native
/// `r ‖ s` as two back-to-back MPIs.
fn sign_digest<R: rand_core::RngCore>(
    sign_ctx: &dyn KeyCtx,
    digest: &[u8],
    rng: &mut R,
) -> Result<Vec<u8>> {
    match sign_ctx.algorithm() {
        CryptAlgo::Rsa => {
            let padded = derive::pkcs1_wrap(digest, sign_ctx.key_size(), rng)?;
            let sig = sign_ctx.sign(&padded)?;
            let mut w = Writer::new();
            w.write_mpi(&sig);
            Ok(w.into_vec())
        }
        CryptAlgo::Dsa => {
            let native = sign_ctx.sign(dsa_hash_input(digest))?;
            dlp::to_pgp(&native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for PGP signing")),
    }
}

fn verify_digest(check_ctx: &dyn KeyCtx, digest: &[u8], sig_mpis: &[u8]) -> Result<()> {
    match check_ctx.algorithm() {
        CryptAlgo::Rsa => {
            let mut c = Cursor::new(sig_mpis);
            let (_bits, mpi) = c.read_mpi().ok_or(Error::Underflow)?;
            c.finish()?;
            check_ctx.verify(digest, mpi)
        }
        CryptAlgo::Dsa => {
            let native = dlp::from_pgp(sig_mpis)?;
            check_ctx.verify(dsa_hash_input(digest), &native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for PGP verification")),
    }
}

/// The decoded fields of a v4 signature packet, beyond what
/// [`QueryInfo`] already carries.
pub struct SignatureV4 {
    /// Signature type byte.
    pub sig_type: u8,
    /// Signing algorithm.
    pub sig_algo: CryptAlgo,
    /// Hash algorithm.
    pub hash_algo: HashAlgorithm,
    /// Authenticated (hashed) subpacket area.
    pub auth_attrs: Vec<Subpacket>,
    /// Unauthenticated (unhashed) subpacket area.
    pub unauth_attrs: Vec<Subpacket>,
    /// The interoperability-only left-16-bits-of-hash check field.
    pub hash_check: [u8; HASH_CHECK_SIZE],
    /// The signer's key id, read out of the authenticated
    /// `IssuerKeyId` subpacket when present.
    pub key_id: Option<[u8; 8]>,
    sig_value: Vec<u8>,
}

/// Reads a v4 signature packet (tag 2). Does not verify; returns the
/// decoded fields and the raw MPI-encoded signature value range for
/// [`check`] to consume.
pub fn read_signature(buf: &[u8]) -> Result<(QueryInfo, SignatureV4)> {
    let mut c = Cursor::new(buf);
    let (ptag, body_len) = c.read_packet_header().ok_or(Error::Underflow)?;
    if ptag != pgp_tag::SIGNATURE {
        return Err(Error::BadData("not a signature packet"));
    }
    let header_len = c.pos();
    let version = c.read_byte().ok_or(Error::Underflow)?;
    if version != VERSION {
        return Err(Error::NotAvail("unsupported PGP signature version"));
    }
    let sig_type = c.read_byte().ok_or(Error::Underflow)?;
    let sig_algo = CryptAlgo::from_pgp_public(c.read_byte().ok_or(Error::Underflow)?)?;
    let hash_algo = HashAlgorithm::from_pgp(c.read_byte().ok_or(Error::Underflow)?)?;

    let auth_len = c.uint16().ok_or(Error::Underflow)? as usize;
    let auth_bytes = c.read_exact(auth_len).ok_or(Error::Underflow)?;
    let auth_attrs = subpacket::parse(auth_bytes)?;

    let unauth_len = c.uint16().ok_or(Error::Underflow)? as usize;
    let unauth_bytes = c.read_exact(unauth_len).ok_or(Error::Underflow)?;
    let unauth_attrs = subpacket::parse(unauth_bytes)?;

    let hash_check_bytes = c.read_exact(HASH_CHECK_SIZE).ok_or(Error::Underflow)?;
    let mut hash_check = [0u8; HASH_CHECK_SIZE];
    hash_check.copy_from_slice(hash_check_bytes);

    let sig_start = c.pos();
    match sig_algo {
        CryptAlgo::Rsa => {
            c.read_mpi().ok_or(Error::Underflow)?;
        }
        CryptAlgo::Dsa => {
            c.read_mpi().ok_or(Error::Underflow)?;
            c.read_mpi().ok_or(Error::Underflow)?;
        }
        _ => return Err(Error::NotAvail("unsupported PGP signature algorithm")),
    }
    let sig_end = c.pos();
    c.finish()?;

    let key_id = subpacket::find(&auth_attrs, SubpacketType::IssuerKeyId).and_then(|sp| {
        if sp.body.len() == 8 {
            let mut k = [0u8; 8];
            k.copy_from_slice(&sp.body);
            Some(k)
        } else {
            None
        }
    });

    let info = QueryInfo {
        format: Some(Format::Pgp),
        kind: Some(ObjectKind::Signature),
        version,
        crypt_algo: Some(sig_algo),
        hash_algo: Some(hash_algo),
        key_id: key_id.map(|k| k.to_vec()).unwrap_or_default(),
        data: Some(sig_start..sig_end),
        size: header_len + body_len,
        ..Default::default()
    };
    let sig = SignatureV4 {
        sig_type,
        sig_algo,
        hash_algo,
        auth_attrs,
        unauth_attrs,
        hash_check,
        key_id,
        sig_value: buf[sig_start..sig_end].to_vec(),
    };
    Ok((info, sig))
}

/// Writes a v4 signature packet. `message_hasher` must already have
/// consumed the signed message body; this function appends the
/// trailer-hashing bytes, signs the result, and emits the packet. The
/// authenticated area always carries a creation-time subpacket and an
/// issuer-key-id subpacket; `issuer_and_serial`, when given, is carried
/// as a `NotationData` subpacket so a CMS-originated signer identity
/// survives a round trip through PGP.
pub fn write_signature<R: rand_core::RngCore>(
    sig_type: u8,
    sign_ctx: &dyn KeyCtx,
    hash_algo: HashAlgorithm,
    message_hasher: Box<dyn HashCtx>,
    key_id: [u8; 8],
    creation_time: u32,
    issuer_and_serial: Option<&[u8]>,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let sig_algo = sign_ctx.algorithm();

    let mut auth_subpackets = vec![
        Subpacket::signature_creation_time(creation_time),
        Subpacket::issuer_key_id(key_id),
    ];
    if let Some(ias) = issuer_and_serial {
        auth_subpackets.push(Subpacket::notation("issuerAndSerialNumber", ias));
    }
    let auth_attrs = subpacket::encode(&auth_subpackets);

    let digest = finalize_signature_hash(message_hasher, sig_type, sig_algo, hash_algo, &auth_attrs)?;
    let hash_check = [digest[0], digest[1]];
    let sig_value = sign_digest(sign_ctx, &digest, rng)?;

    let mut body = Writer::new();
    body.write_byte(VERSION);
    body.write_byte(sig_type);
    body.write_byte(sig_algo.to_pgp_public()?);
    body.write_byte(hash_algo.to_pgp());
    body.write_uint16(auth_attrs.len() as u16);
    body.write_bytes(&auth_attrs);
    body.write_uint16(0);
    body.write_bytes(&hash_check);
    body.write_bytes(&sig_value);
    let body = body.into_vec();

    let mut w = Writer::new();
    w.write_packet_header(pgp_tag::SIGNATURE, body.len());
    w.write_bytes(&body);
    Ok(w.into_vec())
}

/// Verifies a v4 signature packet against a hash context that has
/// already consumed the signed message body. Key-id selection (and the
/// documented PGP-v2-vs-OpenPGP key-id fallback) is the orchestrator's
/// job, not this codec's — by the time `check_ctx` reaches here the
/// caller has already picked the right key.
pub fn check(buf: &[u8], check_ctx: &dyn KeyCtx, message_hasher: Box<dyn HashCtx>) -> Result<QueryInfo> {
    let (info, sig) = read_signature(buf)?;
    let auth_attrs = subpacket::encode(&sig.auth_attrs);
    let digest = finalize_signature_hash(message_hasher, sig.sig_type, sig.sig_algo, sig.hash_algo, &auth_attrs)?;
    verify_digest(check_ctx, &digest, &sig.sig_value)?;
    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HashContext, RsaContext};
    use rsa::RsaPrivateKey;

    fn test_rsa() -> (RsaContext, RsaContext) {
        let mut rng = rand::rngs::mock::StepRng::new(0xdead, 0xbeef);
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = private.to_public_key();
        (RsaContext::from_private(private), RsaContext::from_public(public))
    }

    fn message_hash(algo: HashAlgorithm, message: &[u8]) -> Box<dyn HashCtx> {
        let mut ctx = HashContext::new(algo);
        ctx.update(message);
        Box::new(ctx)
    }

    #[test]
    fn onepass_header_round_trip() {
        let bytes = write_onepass_sig(
            0x00,
            HashAlgorithm::Sha256,
            CryptAlgo::Rsa,
            [0x11u8; 8],
            true,
        )
        .unwrap();
        let header = read_onepass_sig(&bytes).unwrap();
        assert_eq!(header.sig_type, 0x00);
        assert_eq!(header.hash_algo, HashAlgorithm::Sha256);
        assert_eq!(header.sig_algo, CryptAlgo::Rsa);
        assert_eq!(header.key_id, [0x11u8; 8]);
        assert!(header.last);
    }

    #[test]
    fn signature_round_trip() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let key_id = [0x22u8; 8];

        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha256,
            message_hash(HashAlgorithm::Sha256, b"hello world"),
            key_id,
            1_700_000_000,
            None,
            &mut rng,
        )
        .unwrap();

        let info = check(&bytes, &check_ctx, message_hash(HashAlgorithm::Sha256, b"hello world")).unwrap();
        assert_eq!(info.key_id, key_id);
    }

    #[test]
    fn tampered_message_is_rejected() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha256,
            message_hash(HashAlgorithm::Sha256, b"hello world"),
            [0x33u8; 8],
            1_700_000_000,
            None,
            &mut rng,
        )
        .unwrap();

        let err = check(&bytes, &check_ctx, message_hash(HashAlgorithm::Sha256, b"goodbye world")).unwrap_err();
        assert_eq!(err, Error::SignatureError);
    }

    #[test]
    fn carries_issuer_and_serial_notation() {
        let (sign_ctx, _check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let ias = b"fake-der-issuer-and-serial";
        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha256,
            message_hash(HashAlgorithm::Sha256, b"hybrid interop"),
            [0x44u8; 8],
            1_700_000_000,
            Some(ias),
            &mut rng,
        )
        .unwrap();

        let (_info, sig) = read_signature(&bytes).unwrap();
        let notation = subpacket::find(&sig.auth_attrs, SubpacketType::NotationData).unwrap();
        assert!(notation.body.ends_with(ias));
    }

    #[test]
    fn hash_check_matches_leading_digest_bytes() {
        let (sign_ctx, _check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha256,
            message_hash(HashAlgorithm::Sha256, b"hash check vector"),
            [0x55u8; 8],
            1_700_000_000,
            None,
            &mut rng,
        )
        .unwrap();
        let (_info, sig) = read_signature(&bytes).unwrap();

        let auth_attrs = subpacket::encode(&sig.auth_attrs);
        let recomputed = finalize_signature_hash(
            message_hash(HashAlgorithm::Sha256, b"hash check vector"),
            sig.sig_type,
            sig.sig_algo,
            sig.hash_algo,
            &auth_attrs,
        )
        .unwrap();
        assert_eq!(sig.hash_check, [recomputed[0], recomputed[1]]);
    }

    #[test]
    fn dsa_signature_truncates_hash_to_dlp_block() {
        use crate::provider::DsaContext;
        use dsa::{Components, KeySize, SigningKey, VerifyingKey};
        let mut rng = rand::rngs::mock::StepRng::new(0x99, 0x11);
        let components = Components::generate(&mut rng, KeySize::DSA_2048_256);
        let signing = SigningKey::generate(&mut rng, components);
        let verifying: VerifyingKey = signing.verifying_key().clone();
        let sign_ctx = DsaContext::from_private(signing);
        let check_ctx = DsaContext::from_public(verifying);

        let mut rng2 = rand::rngs::mock::StepRng::new(3, 9);
        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha512,
            message_hash(HashAlgorithm::Sha512, b"truncated to dsa block"),
            [0x66u8; 8],
            1_700_000_000,
            None,
            &mut rng2,
        )
        .unwrap();

        check(&bytes, &check_ctx, message_hash(HashAlgorithm::Sha512, b"truncated to dsa block")).unwrap();
    }

    #[test]
    fn signing_time_subpacket_survives_round_trip() {
        let (sign_ctx, _check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let bytes = write_signature(
            0x00,
            &sign_ctx,
            HashAlgorithm::Sha256,
            message_hash(HashAlgorithm::Sha256, b"timed"),
            [0x77u8; 8],
            1_700_000_001,
            None,
            &mut rng,
        )
        .unwrap();
        let (_info, sig) = read_signature(&bytes).unwrap();
        let sp = subpacket::find(&sig.auth_attrs, SubpacketType::SignatureCreationTime).unwrap();
        assert_eq!(u32::from_be_bytes(sp.body[..4].try_into().unwrap()), 1_700_000_001);
    }
}
