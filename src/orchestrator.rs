//! The four public entry points: [`export_key`], [`import_key`],
//! [`create_signature`] and [`check_signature`].
//!
//! Grounded in spec.md §4.H. Where the legacy orchestrator dispatches a
//! single opaque context across six wire formats by opcode, this module
//! dispatches by matching on a format enum instead; each arm composes the
//! matching [`crate::keyex`]/[`crate::sig`] codec with the cert-chain
//! lock/leaf-select step those codecs don't do for themselves.
//!
//! Two simplifications from the legacy message-dispatch design, recorded
//! here rather than silently:
//! - The session key crossing this boundary is a plain byte slice, not a
//!   `KeyCtx`. No [`crate::provider`] type implements `KeyCtx` for a bare
//!   conventional key, and every keyex codec already takes the session
//!   key as `&[u8]`; wrapping it in a trait object here would add a layer
//!   with nothing on the other side of it.
//! - Permission gating (`MESSAGE_CHECK_PKC_*`) has no separate message in
//!   [`crate::context::KeyCtx`] to call; it falls out for free, because
//!   every `KeyCtx` method this module calls (`sign`, `encrypt_dlp`, ...)
//!   already returns [`Error::NotAvail`] by default for a context that
//!   doesn't support it.

use crate::context::{CertChain, CompareMode, HashCtx, KeyCtx, LockGuard};
use crate::query::QueryInfo;
use crate::sig::dlp;
use crate::{derive, keyex, sig};
use crate::{CryptAlgo, Error, HashAlgorithm, Result};

/// Either a bare key/cipher context or a certificate chain acting as one.
///
/// Resolving a [`KeyHandle::Chain`] acquires the chain's lock and selects
/// its leaf certificate for the duration of the returned guard, per
/// spec.md's "certificate-chain selection" rule; resolving a
/// [`KeyHandle::Bare`] context is a no-op, since there is no cursor to
/// protect.
pub enum KeyHandle<'a> {
    /// A key or bulk-cipher context used directly.
    Bare(&'a dyn KeyCtx),
    /// A certificate chain; the leaf is selected on resolve.
    Chain(&'a dyn CertChain),
}

impl<'a> KeyHandle<'a> {
    fn resolve(&self) -> Result<(Option<LockGuard<'_>>, &dyn KeyCtx)> {
        match self {
            KeyHandle::Bare(ctx) => Ok((None, *ctx)),
            KeyHandle::Chain(chain) => {
                let (guard, leaf) = chain.lock_and_select_leaf()?;
                Ok((Some(guard), leaf))
            }
        }
    }
}

/// A buffer holding processed key material that must not outlive the call
/// that produced it. Wraps [`memsec::memzero`] so every exit path —
/// including the early returns `?` scatters through this module — clears
/// the bytes, matching spec.md §5's "sensitive buffers are zeroed on
/// every exit path" rule.
struct SecretBuf(Vec<u8>);

impl std::ops::Deref for SecretBuf {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl Drop for SecretBuf {
    fn drop(&mut self) {
        if !self.0.is_empty() {
            unsafe { memsec::memzero(self.0.as_mut_ptr(), self.0.len()) };
        }
    }
}

/// Checks a PGP key id against `ctx`, retrying once with the PGP v2
/// key-id flavour before declaring [`Error::WrongKey`], and tolerating a
/// context whose provider doesn't implement either PGP-flavoured compare
/// mode at all (this crate's native RSA/ElGamal/DSA contexts only answer
/// [`CompareMode::KeyId`] — see [`crate::sig::pgp::check`]'s doc comment
/// for the same deferral). Key-id selection among several candidate keys
/// is the caller's job; this only validates the one context it was
/// handed actually matches.
fn check_pgp_key_id(ctx: &dyn KeyCtx, key_id: &[u8]) -> Result<()> {
    match ctx.compare(CompareMode::KeyIdOpenPgp, key_id) {
        Ok(()) => Ok(()),
        Err(Error::NotAvail(_)) => Ok(()),
        Err(_) => match ctx.compare(CompareMode::KeyIdPgp, key_id) {
            Ok(()) => Ok(()),
            Err(Error::NotAvail(_)) => Ok(()),
            Err(_) => Err(Error::WrongKey),
        },
    }
}

// ---------------------------------------------------------------------
// export_key / import_key
// ---------------------------------------------------------------------

/// Which key-exchange wire format [`export_key`]/[`import_key`] target,
/// carrying the per-format parameters each codec needs beyond the
/// session key itself.
pub enum ExportFormat<'a> {
    /// Plain CMS `KeyTransRecipientInfo` (v1).
    Cms {
        /// The recipient's DER `IssuerAndSerialNumber`.
        issuer_and_serial: &'a [u8],
        /// The recipient's public-key context.
        wrap_ctx: KeyHandle<'a>,
    },
    /// Cryptlib's extended KeyTrans (v3).
    Cryptlib {
        /// The recipient's native key id.
        key_id: &'a [u8],
        /// The recipient's public-key context.
        wrap_ctx: KeyHandle<'a>,
    },
    /// CMS `KEKRecipientInfo`.
    CmsKek {
        /// The key-encryption key's id.
        key_id: &'a [u8],
        /// The already-available key-encryption key.
        kek: &'a [u8],
        /// The CBC IV the key-wrap construction uses.
        iv: &'a [u8; 16],
    },
    /// CMS `PasswordRecipientInfo`, modern (PWRIKEK-wrapped) form.
    CmsPassword {
        /// PBKDF2 salt.
        salt: &'a [u8],
        /// PBKDF2 iteration count.
        iterations: u32,
        /// The PBKDF2-derived key-encryption key.
        kek: &'a [u8],
        /// The CBC IV the key-wrap construction uses.
        iv: &'a [u8; 16],
    },
    /// OpenPGP PKE (tag 1), RSA or ElGamal depending on `wrap_ctx`.
    Pgp {
        /// The recipient's PGP key id.
        key_id: [u8; 8],
        /// The session-key algorithm id prefixed onto the plaintext.
        session_algo_id: u8,
        /// The recipient's public-key context.
        wrap_ctx: KeyHandle<'a>,
    },
    /// OpenPGP SKE (tag 3): salted-and-iterated S2K over a password.
    /// There is no key-transport ciphertext on the wire — the packet
    /// only announces the derivation parameters, and `session_key` must
    /// already equal what those parameters derive (the caller's own
    /// [`derive::pgp_s2k_salted_iterated`] call); this is checked before
    /// the packet is emitted, so a caller that passes a mismatched key
    /// gets an error instead of an SKE packet that silently lies about
    /// its own derivation.
    PgpPassword {
        /// The password `session_key` derives from.
        password: &'a [u8],
        /// S2K salt.
        salt: &'a [u8; 8],
        /// S2K packed iteration-count byte (see
        /// [`derive::s2k_byte_from_count`]).
        count_byte: u8,
        /// The derivation hash.
        hash_algo: HashAlgorithm,
        /// The bulk cipher `session_key` is sized/used for.
        crypt_algo: CryptAlgo,
    },
}

/// Wraps `session_key` for one recipient, per `format`.
pub fn export_key<R: rand_core::RngCore>(
    session_key: &[u8],
    format: ExportFormat<'_>,
    rng: &mut R,
) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Cms { issuer_and_serial, wrap_ctx } => {
            let (_guard, leaf) = wrap_ctx.resolve()?;
            keyex::cms::write_keytrans(session_key, issuer_and_serial, leaf, rng)
        }
        ExportFormat::Cryptlib { key_id, wrap_ctx } => {
            let (_guard, leaf) = wrap_ctx.resolve()?;
            keyex::cryptlib::write_keytrans(session_key, key_id, leaf, rng)
        }
        ExportFormat::CmsKek { key_id, kek, iv } => {
            keyex::cms::write_kekri(session_key, key_id, kek, iv, rng)
        }
        ExportFormat::CmsPassword { salt, iterations, kek, iv } => {
            keyex::cms::write_pwri(session_key, salt, iterations, kek, iv, rng)
        }
        ExportFormat::Pgp { key_id, session_algo_id, wrap_ctx } => {
            let (_guard, leaf) = wrap_ctx.resolve()?;
            match leaf.algorithm() {
                CryptAlgo::Rsa => keyex::pgp::write_pke_rsa(key_id, session_algo_id, session_key, leaf, rng),
                CryptAlgo::ElGamal => {
                    keyex::pgp::write_pke_elgamal(key_id, session_algo_id, session_key, leaf, rng)
                }
                _ => Err(Error::NotAvail("algorithm not supported for PGP key exchange")),
            }
        }
        ExportFormat::PgpPassword { password, salt, count_byte, hash_algo, crypt_algo } => {
            let iterations = derive::s2k_count_from_byte(count_byte);
            let derived = SecretBuf(derive::pgp_s2k_salted_iterated(
                hash_algo,
                salt,
                iterations,
                password,
                session_key.len(),
            ));
            if &*derived != session_key {
                return Err(Error::ArgError { parameter: "session_key" });
            }
            keyex::pgp::write_ske(crypt_algo, session_key.len(), hash_algo, salt, count_byte)
        }
    }
}

/// Which key-exchange wire format [`import_key`] should parse `buf` as.
pub enum ImportFormat<'a> {
    /// Plain CMS `KeyTransRecipientInfo` (v1).
    Cms {
        /// The importer's private-key context.
        import_ctx: KeyHandle<'a>,
    },
    /// Cryptlib's extended KeyTrans (v3).
    Cryptlib {
        /// The importer's private-key context.
        import_ctx: KeyHandle<'a>,
    },
    /// CMS `KEKRecipientInfo`.
    CmsKek {
        /// The already-available key-encryption key.
        kek: &'a [u8],
        /// The CBC IV the key-wrap construction uses.
        iv: &'a [u8; 16],
    },
    /// CMS `PasswordRecipientInfo` (either encoding; detected on read).
    CmsPassword {
        /// The password the key-encryption key derives from.
        password: &'a [u8],
        /// The CBC IV the key-wrap construction uses.
        iv: &'a [u8; 16],
    },
    /// OpenPGP PKE (tag 1).
    Pgp {
        /// The importer's private-key context.
        import_ctx: KeyHandle<'a>,
    },
    /// OpenPGP SKE (tag 3): derives the session key straight from the
    /// packet's announced S2K parameters and the password — there is no
    /// key-transport ciphertext to decrypt (see scenario E2, spec.md §8).
    PgpPassword {
        /// The password the key derives from.
        password: &'a [u8],
        /// The key size to derive, in bytes. Three PGP cipher ids alias
        /// a single native AES id (spec.md §4.B), so the true size can't
        /// be read off the wire and must come from the caller.
        key_size: usize,
    },
}

/// Unwraps a session key from `buf`, per `format`.
pub fn import_key(buf: &[u8], format: ImportFormat<'_>) -> Result<Vec<u8>> {
    match format {
        ImportFormat::Cms { import_ctx } => {
            let info = keyex::cms::read_keytrans(buf)?;
            let (_guard, leaf) = import_ctx.resolve()?;
            let range = info.data.ok_or(Error::Underflow)?;
            let padded = SecretBuf(leaf.raw_private(&buf[range])?);
            derive::pkcs1_unwrap(&padded)
        }
        ImportFormat::Cryptlib { import_ctx } => {
            let info = keyex::cryptlib::read_keytrans(buf)?;
            let (_guard, leaf) = import_ctx.resolve()?;
            leaf.compare(CompareMode::KeyId, &info.key_id).map_err(|_| Error::WrongKey)?;
            let range = info.data.ok_or(Error::Underflow)?;
            let padded = SecretBuf(leaf.raw_private(&buf[range])?);
            derive::pkcs1_unwrap(&padded)
        }
        ImportFormat::CmsKek { kek, iv } => {
            let (info, _key_id) = keyex::cms::read_kekri(buf)?;
            let range = info.data.ok_or(Error::Underflow)?;
            derive::cms_keyunwrap(&buf[range], kek, iv)
        }
        ImportFormat::CmsPassword { password, iv } => {
            let (info, pwri) = keyex::cms::read_pwri(buf)?;
            let kek = SecretBuf(derive::pbkdf2_sha1(password, &pwri.salt, pwri.iterations, pwri.kek_key_len));
            let range = info.data.ok_or(Error::Underflow)?;
            derive::cms_keyunwrap(&buf[range], &kek, iv)
        }
        ImportFormat::Pgp { import_ctx } => {
            let (info, ciphertext) = keyex::pgp::read_pke(buf)?;
            let (_guard, leaf) = import_ctx.resolve()?;
            check_pgp_key_id(leaf, &info.key_id)?;
            let (_algo_id, key) = match leaf.algorithm() {
                CryptAlgo::Rsa => keyex::pgp::unwrap_rsa(&ciphertext, leaf)?,
                CryptAlgo::ElGamal => keyex::pgp::unwrap_elgamal(&ciphertext, leaf)?,
                _ => return Err(Error::NotAvail("algorithm not supported for PGP key exchange")),
            };
            Ok(key)
        }
        ImportFormat::PgpPassword { password, key_size } => {
            let (_info, _crypt_algo, ske) = keyex::pgp::read_ske(buf)?;
            match ske.spec {
                keyex::pgp::S2kSpec::Iterated => Ok(derive::pgp_s2k_salted_iterated(
                    ske.hash_algo,
                    &ske.salt,
                    ske.iteration_count,
                    password,
                    key_size,
                )),
                _ => Err(Error::NotAvail("only salted+iterated S2K is supported for PGP password import")),
            }
        }
    }
}

// ---------------------------------------------------------------------
// create_signature / check_signature
// ---------------------------------------------------------------------

/// Which signature wire format [`create_signature`]/[`check_signature`]
/// target, carrying the per-format parameters each codec needs beyond
/// the signing context and message hash.
pub enum SignatureFormat<'a> {
    /// Bare `BIT STRING` wrapper, no algorithm identifier.
    Raw,
    /// X.509-style: a signature `AlgorithmIdentifier` then a `BIT STRING`.
    X509,
    /// CMS `SignerInfo` with signed attributes attached.
    Cms {
        /// The signer's DER `IssuerAndSerialNumber`.
        issuer_and_serial: &'a [u8],
        /// A reliable signing time, when one is available.
        signing_time: Option<u32>,
    },
    /// CMS `SignerInfo` with no signed attributes.
    CmsBare {
        /// The signer's DER `IssuerAndSerialNumber`.
        issuer_and_serial: &'a [u8],
    },
    /// Cryptlib's extended signature form (v3).
    Cryptlib {
        /// The signer's native key id.
        key_id: &'a [u8],
    },
    /// OpenPGP v4 signature packet.
    Pgp {
        /// The signature-type byte (binary, canonical text, ...).
        sig_type: u8,
        /// The signer's PGP key id.
        key_id: [u8; 8],
        /// The signature's creation-time subpacket value.
        creation_time: u32,
        /// Optional CMS-originated `issuerAndSerialNumber`, carried as a
        /// notation subpacket for hybrid interop.
        issuer_and_serial: Option<&'a [u8]>,
    },
    /// SSH wire signature.
    Ssh,
    /// SSL 3.0/TLS raw signature.
    Ssl,
}

fn sign_digest_der<R: rand_core::RngCore>(ctx: &dyn KeyCtx, digest: &[u8], rng: &mut R) -> Result<Vec<u8>> {
    match ctx.algorithm() {
        CryptAlgo::Rsa => {
            let padded = derive::pkcs1_wrap(digest, ctx.key_size(), rng)?;
            ctx.sign(&padded)
        }
        CryptAlgo::Dsa => {
            let native = ctx.sign(digest)?;
            dlp::to_der(&native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for this signature format")),
    }
}

fn verify_digest_der(ctx: &dyn KeyCtx, digest: &[u8], sig: &[u8]) -> Result<()> {
    match ctx.algorithm() {
        CryptAlgo::Rsa => ctx.verify(digest, sig),
        CryptAlgo::Dsa => {
            let native = dlp::from_der(sig)?;
            ctx.verify(digest, &native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for this signature format")),
    }
}

fn sign_digest_ssh<R: rand_core::RngCore>(ctx: &dyn KeyCtx, digest: &[u8], rng: &mut R) -> Result<Vec<u8>> {
    match ctx.algorithm() {
        CryptAlgo::Rsa => {
            let padded = derive::pkcs1_wrap(digest, ctx.key_size(), rng)?;
            ctx.sign(&padded)
        }
        CryptAlgo::Dsa => {
            let native = ctx.sign(digest)?;
            dlp::to_ssh(&native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for SSH signatures")),
    }
}

fn verify_digest_ssh(ctx: &dyn KeyCtx, digest: &[u8], sig: &[u8]) -> Result<()> {
    match ctx.algorithm() {
        CryptAlgo::Rsa => ctx.verify(digest, sig),
        CryptAlgo::Dsa => {
            let native = dlp::from_ssh(sig)?;
            ctx.verify(digest, &native)
        }
        _ => Err(Error::NotAvail("algorithm not supported for SSH signatures")),
    }
}

/// Produces a signature over the message this `hash_ctx` has already
/// consumed, per `format`. For [`SignatureFormat::Pgp`], `hash_ctx` must
/// not be finalised yet — [`sig::pgp::write_signature`] runs the
/// trailer-hashing protocol itself; every other format finalises it here.
pub fn create_signature<R: rand_core::RngCore>(
    sign_ctx: &KeyHandle<'_>,
    hash_ctx: Box<dyn HashCtx>,
    format: SignatureFormat<'_>,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let (_guard, leaf) = sign_ctx.resolve()?;
    let hash_algo = hash_ctx.algorithm();

    match format {
        SignatureFormat::Raw => {
            let digest = hash_ctx.finalize();
            let sig = sign_digest_der(leaf, &digest, rng)?;
            Ok(sig::raw::write_raw(&sig))
        }
        SignatureFormat::X509 => {
            let digest = hash_ctx.finalize();
            let sig = sign_digest_der(leaf, &digest, rng)?;
            sig::raw::write_x509(leaf.algorithm(), hash_algo, &sig)
        }
        SignatureFormat::Cms { issuer_and_serial, signing_time } => {
            let message_digest = hash_ctx.finalize();
            sig::cms::write(issuer_and_serial, hash_algo, &message_digest, signing_time, leaf, rng)
        }
        SignatureFormat::CmsBare { issuer_and_serial } => {
            let message_digest = hash_ctx.finalize();
            sig::cms::write_bare(issuer_and_serial, hash_algo, &message_digest, leaf, rng)
        }
        SignatureFormat::Cryptlib { key_id } => {
            let digest = hash_ctx.finalize();
            sig::cryptlib::write(key_id, hash_algo, leaf, &digest, rng)
        }
        SignatureFormat::Pgp { sig_type, key_id, creation_time, issuer_and_serial } => sig::pgp::write_signature(
            sig_type,
            leaf,
            hash_algo,
            hash_ctx,
            key_id,
            creation_time,
            issuer_and_serial,
            rng,
        ),
        SignatureFormat::Ssh => {
            let digest = hash_ctx.finalize();
            let sig = sign_digest_ssh(leaf, &digest, rng)?;
            sig::ssh::write_ssh(leaf.algorithm(), &sig)
        }
        SignatureFormat::Ssl => {
            let digest = hash_ctx.finalize();
            let sig = sign_digest_der(leaf, &digest, rng)?;
            Ok(sig::ssl::write_ssl(&sig)?)
        }
    }
}

/// Verifies `buf` against the message this `hash_ctx` has already
/// consumed, per `format`. Returns the decoded [`QueryInfo`] on success.
pub fn check_signature(
    buf: &[u8],
    check_ctx: &KeyHandle<'_>,
    hash_ctx: Box<dyn HashCtx>,
    format: SignatureFormat<'_>,
) -> Result<QueryInfo> {
    let (_guard, leaf) = check_ctx.resolve()?;

    match format {
        SignatureFormat::Raw => {
            let digest = hash_ctx.finalize();
            let info = sig::raw::read_raw(buf)?;
            let range = info.data.clone().ok_or(Error::Underflow)?;
            verify_digest_der(leaf, &digest, &buf[range])?;
            Ok(info)
        }
        SignatureFormat::X509 => {
            let digest = hash_ctx.finalize();
            let info = sig::raw::read_x509(buf)?;
            let range = info.data.clone().ok_or(Error::Underflow)?;
            verify_digest_der(leaf, &digest, &buf[range])?;
            Ok(info)
        }
        SignatureFormat::Cms { .. } | SignatureFormat::CmsBare { .. } => {
            let message_digest = hash_ctx.finalize();
            sig::cms::verify(buf, leaf, &message_digest)
        }
        SignatureFormat::Cryptlib { .. } => {
            let digest = hash_ctx.finalize();
            let info = sig::cryptlib::read(buf)?;
            sig::cryptlib::check(buf, leaf, &digest)?;
            Ok(info)
        }
        SignatureFormat::Pgp { .. } => {
            let (info, _sig) = sig::pgp::read_signature(buf)?;
            if !info.key_id.is_empty() {
                check_pgp_key_id(leaf, &info.key_id)?;
            }
            sig::pgp::check(buf, leaf, hash_ctx)
        }
        SignatureFormat::Ssh => {
            let digest = hash_ctx.finalize();
            let info = sig::ssh::read_ssh(buf)?;
            let range = info.data.clone().ok_or(Error::Underflow)?;
            verify_digest_ssh(leaf, &digest, &buf[range])?;
            Ok(info)
        }
        SignatureFormat::Ssl => {
            let digest = hash_ctx.finalize();
            let info = sig::ssl::read_ssl(buf)?;
            let range = info.data.clone().ok_or(Error::Underflow)?;
            verify_digest_der(leaf, &digest, &buf[range])?;
            Ok(info)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HashContext, RsaContext};
    use crate::sig::pgp as sig_pgp;
    use rsa::RsaPrivateKey;

    fn test_rsa() -> (RsaContext, RsaContext) {
        let mut rng = rand::rngs::mock::StepRng::new(0xa5a5, 0x5a5a);
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = private.to_public_key();
        (RsaContext::from_private(private), RsaContext::from_public(public))
    }

    fn hash_of(algo: HashAlgorithm, message: &[u8]) -> Box<dyn HashCtx> {
        let mut ctx = HashContext::new(algo);
        ctx.update(message);
        Box::new(ctx)
    }

    fn test_ias() -> Vec<u8> {
        let mut w = crate::cursor::Writer::new();
        w.write_sequence_header(3);
        w.write_bytes(&[9, 9, 9]);
        w.into_vec()
    }

    #[test]
    fn export_then_import_cms_keytrans() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let ias = test_ias();
        let session_key = [0x42u8; 16];

        let wrapped = export_key(
            &session_key,
            ExportFormat::Cms { issuer_and_serial: &ias, wrap_ctx: KeyHandle::Bare(&check_ctx) },
            &mut rng,
        )
        .unwrap();

        let recovered =
            import_key(&wrapped, ImportFormat::Cms { import_ctx: KeyHandle::Bare(&sign_ctx) }).unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn export_then_import_cryptlib_keytrans() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(3, 11);
        let session_key = [0x77u8; 16];
        let key_id = [0xaau8; 8];

        let wrapped = export_key(
            &session_key,
            ExportFormat::Cryptlib { key_id: &key_id, wrap_ctx: KeyHandle::Bare(&check_ctx) },
            &mut rng,
        )
        .unwrap();

        let recovered =
            import_key(&wrapped, ImportFormat::Cryptlib { import_ctx: KeyHandle::Bare(&sign_ctx) }).unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn export_then_import_cms_kekri() {
        let mut rng = rand::rngs::mock::StepRng::new(1, 2);
        let session_key = [0x11u8; 16];
        let kek = [0x22u8; 16];
        let iv = [0u8; 16];
        let key_id = [0xbbu8; 8];

        let wrapped =
            export_key(&session_key, ExportFormat::CmsKek { key_id: &key_id, kek: &kek, iv: &iv }, &mut rng)
                .unwrap();

        let recovered = import_key(&wrapped, ImportFormat::CmsKek { kek: &kek, iv: &iv }).unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn export_then_import_cms_password() {
        let mut rng = rand::rngs::mock::StepRng::new(5, 9);
        let session_key = [0x33u8; 16];
        let salt = [0x01u8; 8];
        let iterations = 500;
        let kek = derive::pbkdf2_sha1(b"hunter2", &salt, iterations, 16);
        let mut kek16 = [0u8; 16];
        kek16.copy_from_slice(&kek);
        let iv = [0u8; 16];

        let wrapped = export_key(
            &session_key,
            ExportFormat::CmsPassword { salt: &salt, iterations, kek: &kek16, iv: &iv },
            &mut rng,
        )
        .unwrap();

        let recovered =
            import_key(&wrapped, ImportFormat::CmsPassword { password: b"hunter2", iv: &iv }).unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn export_then_import_pgp_pke() {
        let mut keygen_rng = rand::rngs::mock::StepRng::new(0x9999, 0x1111);
        let private = RsaPrivateKey::new(&mut keygen_rng, 1024).unwrap();
        let public = private.to_public_key();
        let wrap_ctx = RsaContext::from_public(public);
        let unwrap_ctx = RsaContext::from_private(private);

        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let session_key = [0x55u8; 16];
        let key_id = [0xccu8; 8];

        let wrapped = export_key(
            &session_key,
            ExportFormat::Pgp { key_id, session_algo_id: 9, wrap_ctx: KeyHandle::Bare(&wrap_ctx) },
            &mut rng,
        )
        .unwrap();

        let recovered = import_key(&wrapped, ImportFormat::Pgp { import_ctx: KeyHandle::Bare(&unwrap_ctx) })
            .unwrap();
        assert_eq!(recovered, session_key);
    }

    /// Scenario E2 (spec.md §8), driven through the public `export_key`/
    /// `import_key` entry points rather than calling the codec/derivation
    /// functions directly.
    #[test]
    fn export_then_import_pgp_password_ske() {
        let salt = [0u8, 1, 2, 3, 4, 5, 6, 7];
        let password = b"abcdefghijklmnop";
        let count_byte = 0x60u8;
        let iterations = derive::s2k_count_from_byte(count_byte);
        let session_key = derive::pgp_s2k_salted_iterated(
            HashAlgorithm::Sha1,
            &salt,
            iterations,
            password,
            16,
        );
        let mut rng = rand::rngs::mock::StepRng::new(1, 1);

        let wrapped = export_key(
            &session_key,
            ExportFormat::PgpPassword {
                password,
                salt: &salt,
                count_byte,
                hash_algo: HashAlgorithm::Sha1,
                crypt_algo: CryptAlgo::Aes,
            },
            &mut rng,
        )
        .unwrap();
        assert_eq!(
            wrapped,
            vec![0xc3, 0x0d, 0x04, 0x07, 0x03, 0x02, 0, 1, 2, 3, 4, 5, 6, 7, 0x60]
        );

        let recovered =
            import_key(&wrapped, ImportFormat::PgpPassword { password, key_size: 16 }).unwrap();
        assert_eq!(recovered, session_key);
    }

    #[test]
    fn export_then_import_pgp_password_ske_rejects_mismatched_key() {
        let salt = [0u8; 8];
        let mut rng = rand::rngs::mock::StepRng::new(1, 1);
        let wrong_key = [0xffu8; 16];

        let result = export_key(
            &wrong_key,
            ExportFormat::PgpPassword {
                password: b"hunter2",
                salt: &salt,
                count_byte: 0x20,
                hash_algo: HashAlgorithm::Sha1,
                crypt_algo: CryptAlgo::Aes,
            },
            &mut rng,
        );
        assert!(matches!(result, Err(Error::ArgError { .. })));
    }

    #[test]
    fn create_then_check_raw_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"raw message"),
            SignatureFormat::Raw,
            &mut rng,
        )
        .unwrap();

        check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"raw message"),
            SignatureFormat::Raw,
        )
        .unwrap();
    }

    #[test]
    fn create_then_check_x509_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"x509 message"),
            SignatureFormat::X509,
            &mut rng,
        )
        .unwrap();

        let info = check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"x509 message"),
            SignatureFormat::X509,
        )
        .unwrap();
        assert_eq!(info.crypt_algo, Some(CryptAlgo::Rsa));
    }

    #[test]
    fn create_then_check_cms_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let ias = test_ias();

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"cms message"),
            SignatureFormat::Cms { issuer_and_serial: &ias, signing_time: Some(1_700_000_000) },
            &mut rng,
        )
        .unwrap();

        check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"cms message"),
            SignatureFormat::Cms { issuer_and_serial: &ias, signing_time: Some(1_700_000_000) },
        )
        .unwrap();
    }

    #[test]
    fn create_then_check_cryptlib_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let key_id = [0x42u8; 8];

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha1, b"cryptlib message"),
            SignatureFormat::Cryptlib { key_id: &key_id },
            &mut rng,
        )
        .unwrap();

        check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha1, b"cryptlib message"),
            SignatureFormat::Cryptlib { key_id: &key_id },
        )
        .unwrap();
    }

    #[test]
    fn create_then_check_pgp_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let key_id = [0x88u8; 8];

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"pgp message"),
            SignatureFormat::Pgp { sig_type: 0x00, key_id, creation_time: 1_700_000_000, issuer_and_serial: None },
            &mut rng,
        )
        .unwrap();

        let info = check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"pgp message"),
            SignatureFormat::Pgp { sig_type: 0x00, key_id, creation_time: 1_700_000_000, issuer_and_serial: None },
        )
        .unwrap();
        assert_eq!(info.key_id, key_id);
    }

    #[test]
    fn create_then_check_ssh_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"ssh message"),
            SignatureFormat::Ssh,
            &mut rng,
        )
        .unwrap();

        check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"ssh message"),
            SignatureFormat::Ssh,
        )
        .unwrap();
    }

    #[test]
    fn create_then_check_ssl_signature() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"ssl message"),
            SignatureFormat::Ssl,
            &mut rng,
        )
        .unwrap();

        check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"ssl message"),
            SignatureFormat::Ssl,
        )
        .unwrap();
    }

    #[test]
    fn tampered_raw_signature_is_rejected() {
        let (sign_ctx, check_ctx) = test_rsa();
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);

        let sig = create_signature(
            &KeyHandle::Bare(&sign_ctx),
            hash_of(HashAlgorithm::Sha256, b"original"),
            SignatureFormat::Raw,
            &mut rng,
        )
        .unwrap();

        let err = check_signature(
            &sig,
            &KeyHandle::Bare(&check_ctx),
            hash_of(HashAlgorithm::Sha256, b"tampered"),
            SignatureFormat::Raw,
        )
        .unwrap_err();
        assert_eq!(err, Error::SignatureError);
    }

    // `sig_pgp` is imported only to document that this module composes
    // with, rather than duplicates, the one-pass header codec; nothing
    // here needs to call it directly.
    #[allow(dead_code)]
    fn _uses_sig_pgp_module() -> Option<sig_pgp::OnePassSig> {
        None
    }
}
