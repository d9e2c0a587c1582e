//! Concrete context implementations backing the [`crate::context`] traits.
//!
//! These are the "primitive provider" of spec §6: real RSA/DSA/ElGamal
//! key material and real hash state, so that the mechanism-layer codecs
//! in [`crate::derive`], [`crate::keyex`] and [`crate::sig`] exercise
//! wire-compatible cryptography rather than a stub. Out-of-process or
//! hardware-backed contexts are free to implement the same traits
//! without touching this module.

use crate::algorithm::{CryptAlgo, HashAlgorithm};
use crate::context::{CompareMode, HashCtx, KeyCtx};
use crate::{Error, Result};
use digest::DynDigest;
use num_bigint_dig::BigUint;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use sha2::{Digest, Sha256};
use std::sync::atomic::AtomicBool;

/// A running hash, wrapping a boxed [`digest::DynDigest`] so callers drive
/// any supported algorithm through one type.
pub struct HashContext {
    algo: HashAlgorithm,
    inner: Box<dyn DynDigest>,
}

impl HashContext {
    /// Starts a new hash context for `algo`.
    pub fn new(algo: HashAlgorithm) -> Self {
        HashContext {
            algo,
            inner: algo.hasher(),
        }
    }
}

impl HashCtx for HashContext {
    fn algorithm(&self) -> HashAlgorithm {
        self.algo
    }

    fn update(&mut self, buf: &[u8]) {
        self.inner.update(buf);
    }

    fn finalize(mut self: Box<Self>) -> Vec<u8> {
        self.inner.finalize_reset().to_vec()
    }
}

/// Computes the key identifier this crate uses for [`CompareMode::KeyId`]:
/// the low 64 bits of a SHA-256 digest over the subject's public key
/// material. PGP-flavoured comparisons use their own fingerprint rules
/// and are computed by the caller supplying PGP key material, not by this
/// helper.
pub fn native_key_id(public_material: &[u8]) -> [u8; 8] {
    let digest = Sha256::digest(public_material);
    let mut id = [0u8; 8];
    id.copy_from_slice(&digest[digest.len() - 8..]);
    id
}

/// An RSA context, public half, private half, or both.
pub struct RsaContext {
    public: rsa::RsaPublicKey,
    private: Option<rsa::RsaPrivateKey>,
    key_id: [u8; 8],
    locked: AtomicBool,
}

impl RsaContext {
    /// Builds a context from a public key alone (verify/encrypt only).
    pub fn from_public(public: rsa::RsaPublicKey) -> Self {
        let key_id = native_key_id(&public.n().to_bytes_be());
        RsaContext {
            public,
            private: None,
            key_id,
            locked: AtomicBool::new(false),
        }
    }

    /// Builds a context from a private key (also exposes the public half).
    pub fn from_private(private: rsa::RsaPrivateKey) -> Self {
        let public = private.to_public_key();
        let key_id = native_key_id(&public.n().to_bytes_be());
        RsaContext {
            public,
            private: Some(private),
            key_id,
            locked: AtomicBool::new(false),
        }
    }

    fn modpow_public(&self, buf: &[u8]) -> Vec<u8> {
        let m = BigUint::from_bytes_be(buf);
        let c = m.modpow(self.public.e(), self.public.n());
        let size = (self.public.n().bits() as usize + 7) / 8;
        let mut out = c.to_bytes_be();
        while out.len() < size {
            out.insert(0, 0);
        }
        out
    }

    fn modpow_private(&self, buf: &[u8]) -> Result<Vec<u8>> {
        let private = self
            .private
            .as_ref()
            .ok_or(Error::NotAvail("no private key"))?;
        let c = BigUint::from_bytes_be(buf);
        let m = c.modpow(private.d(), private.n());
        let size = (private.n().bits() as usize + 7) / 8;
        let mut out = m.to_bytes_be();
        while out.len() < size {
            out.insert(0, 0);
        }
        Ok(out)
    }
}

impl KeyCtx for RsaContext {
    fn algorithm(&self) -> CryptAlgo {
        CryptAlgo::Rsa
    }

    fn key_size(&self) -> usize {
        (self.public.n().bits() as usize + 7) / 8
    }

    fn lock_flag(&self) -> &AtomicBool {
        &self.locked
    }

    fn encrypt(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.raw_public(buf)
    }

    fn decrypt(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.raw_private(buf)
    }

    fn sign(&self, hash: &[u8]) -> Result<Vec<u8>> {
        // `hash` is already the full PKCS#1-padded block; see
        // crate::derive::pkcs1_wrap.
        self.raw_private(hash)
    }

    fn verify(&self, hash: &[u8], sig: &[u8]) -> Result<()> {
        let recovered = self.raw_public(sig);
        crate::derive::pkcs1_unwrap(&recovered)
            .map_err(|_| Error::SignatureError)
            .and_then(|payload| {
                if payload == hash {
                    Ok(())
                } else {
                    Err(Error::SignatureError)
                }
            })
    }

    fn compare(&self, mode: CompareMode, bytes: &[u8]) -> Result<()> {
        match mode {
            CompareMode::KeyId => {
                if bytes == self.key_id {
                    Ok(())
                } else {
                    Err(Error::from_compare_failed())
                }
            }
            _ => Err(Error::NotAvail("comparison mode not supported by RSA context")),
        }
    }

    fn raw_public(&self, buf: &[u8]) -> Result<Vec<u8>> {
        Ok(self.modpow_public(buf))
    }

    fn raw_private(&self, buf: &[u8]) -> Result<Vec<u8>> {
        self.modpow_private(buf)
    }
}

/// A DSA context (signature algorithm only; DSA is never used for key
/// transport).
pub struct DsaContext {
    verifying: dsa::VerifyingKey,
    signing: Option<dsa::SigningKey>,
    key_id: [u8; 8],
    locked: AtomicBool,
}

impl DsaContext {
    /// Builds a verify-only context.
    pub fn from_public(verifying: dsa::VerifyingKey) -> Self {
        let key_id = native_key_id(&verifying.y().to_bytes_be());
        DsaContext {
            verifying,
            signing: None,
            key_id,
            locked: AtomicBool::new(false),
        }
    }

    /// Builds a sign-and-verify context.
    pub fn from_private(signing: dsa::SigningKey) -> Self {
        let verifying = signing.verifying_key().clone();
        let key_id = native_key_id(&verifying.y().to_bytes_be());
        DsaContext {
            verifying,
            signing: Some(signing),
            key_id,
            locked: AtomicBool::new(false),
        }
    }
}

impl KeyCtx for DsaContext {
    fn algorithm(&self) -> CryptAlgo {
        CryptAlgo::Dsa
    }

    fn key_size(&self) -> usize {
        (self.verifying.components().p().bits() as usize + 7) / 8
    }

    fn lock_flag(&self) -> &AtomicBool {
        &self.locked
    }

    fn encrypt(&self, _buf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("DSA does not encrypt"))
    }

    fn decrypt(&self, _buf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("DSA does not decrypt"))
    }

    fn sign(&self, hash: &[u8]) -> Result<Vec<u8>> {
        if hash.len() != 20 {
            return Err(Error::ArgError { parameter: "hash" });
        }
        use dsa::signature::hazmat::PrehashSigner;
        let signing = self.signing.as_ref().ok_or(Error::NotAvail("no private key"))?;
        let sig: dsa::Signature = signing
            .sign_prehash(hash)
            .map_err(|e| Error::Failed(e.to_string()))?;
        // `to_bytes_be()` emits the minimal encoding, which is shorter than
        // DLP_COMPONENT_SIZE whenever r/s has a high-order zero byte; the
        // dlp module's wire codecs require the fixed 2*DLP_COMPONENT_SIZE
        // native shape, so pad each component here rather than at every
        // reader (the verify path already re-pads on decode).
        let r = crate::sig::dlp::pad_component(&sig.r().to_bytes_be())?;
        let s = crate::sig::dlp::pad_component(&sig.s().to_bytes_be())?;
        let mut out = Vec::with_capacity(2 * crate::sig::dlp::DLP_COMPONENT_SIZE);
        out.extend_from_slice(&r);
        out.extend_from_slice(&s);
        Ok(out)
    }

    fn verify(&self, hash: &[u8], sig: &[u8]) -> Result<()> {
        if hash.len() != 20 {
            return Err(Error::ArgError { parameter: "hash" });
        }
        use dsa::signature::hazmat::PrehashVerifier;
        let half = sig.len() / 2;
        let r = BigUint::from_bytes_be(&sig[..half]);
        let s = BigUint::from_bytes_be(&sig[half..]);
        let signature = dsa::Signature::from_components(r, s)
            .map_err(|e| Error::Failed(e.to_string()))?;
        self.verifying
            .verify_prehash(hash, &signature)
            .map_err(|_| Error::SignatureError)
    }

    fn compare(&self, mode: CompareMode, bytes: &[u8]) -> Result<()> {
        match mode {
            CompareMode::KeyId => {
                if bytes == self.key_id {
                    Ok(())
                } else {
                    Err(Error::from_compare_failed())
                }
            }
            _ => Err(Error::NotAvail("comparison mode not supported by DSA context")),
        }
    }
}

/// A hand-rolled ElGamal context. No RustCrypto crate implements ElGamal
/// (it is not a modern-standard primitive), so this builds directly on
/// `num-bigint-dig`'s modexp, mirroring how the original mechanism layer
/// rolls ElGamal over its own bignum library rather than a borrowed
/// implementation.
pub struct ElGamalContext {
    p: BigUint,
    g: BigUint,
    y: BigUint,
    x: Option<BigUint>,
    key_id: [u8; 8],
    locked: AtomicBool,
}

impl ElGamalContext {
    /// Builds a verify/encrypt-only context from the public parameters.
    pub fn from_public(p: BigUint, g: BigUint, y: BigUint) -> Self {
        let key_id = native_key_id(&y.to_bytes_be());
        ElGamalContext {
            p,
            g,
            y,
            x: None,
            key_id,
            locked: AtomicBool::new(false),
        }
    }

    /// Builds a decrypt-capable context with the private exponent `x`.
    pub fn from_private(p: BigUint, g: BigUint, y: BigUint, x: BigUint) -> Self {
        let key_id = native_key_id(&y.to_bytes_be());
        ElGamalContext {
            p,
            g,
            y,
            x: Some(x),
            key_id,
            locked: AtomicBool::new(false),
        }
    }

    /// Encrypts `buf` (already PKCS#1-padded to key size), returning the
    /// two MPI-sized ciphertext components `(c1, c2)`.
    pub fn encrypt_pair(&self, buf: &[u8], k: &BigUint) -> (Vec<u8>, Vec<u8>) {
        let m = BigUint::from_bytes_be(buf);
        let c1 = self.g.modpow(k, &self.p);
        let c2 = (m * self.y.modpow(k, &self.p)) % &self.p;
        (c1.to_bytes_be(), c2.to_bytes_be())
    }

    /// Decrypts a `(c1, c2)` pair back to the padded plaintext block.
    pub fn decrypt_pair(&self, c1: &[u8], c2: &[u8]) -> Result<Vec<u8>> {
        let x = self.x.as_ref().ok_or(Error::NotAvail("no private key"))?;
        let c1 = BigUint::from_bytes_be(c1);
        let c2 = BigUint::from_bytes_be(c2);
        let s = c1.modpow(x, &self.p);
        let s_inv = mod_inverse(&s, &self.p).ok_or(Error::BadData("elgamal"))?;
        let m = (c2 * s_inv) % &self.p;
        let size = (self.p.bits() as usize + 7) / 8;
        let mut out = m.to_bytes_be();
        while out.len() < size {
            out.insert(0, 0);
        }
        Ok(out)
    }
}

fn mod_inverse(a: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    // Fermat's little theorem requires a prime modulus, which `p` is for
    // any valid ElGamal domain parameter set.
    let exponent = modulus - BigUint::from(2u8);
    Some(a.modpow(&exponent, modulus))
}

impl KeyCtx for ElGamalContext {
    fn algorithm(&self) -> CryptAlgo {
        CryptAlgo::ElGamal
    }

    fn key_size(&self) -> usize {
        (self.p.bits() as usize + 7) / 8
    }

    fn lock_flag(&self) -> &AtomicBool {
        &self.locked
    }

    fn encrypt(&self, buf: &[u8]) -> Result<Vec<u8>> {
        // Ephemeral k must be generated by the caller holding the lock
        // (see crate::keyex::pgp); direct KeyCtx::encrypt is unsupported
        // because the two-MPI shape doesn't fit the single-buffer trait.
        let _ = buf;
        Err(Error::NotAvail("use encrypt_pair under a held lock"))
    }

    fn decrypt(&self, _buf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("use decrypt_pair"))
    }

    fn compare(&self, mode: CompareMode, bytes: &[u8]) -> Result<()> {
        match mode {
            CompareMode::KeyId => {
                if bytes == self.key_id {
                    Ok(())
                } else {
                    Err(Error::from_compare_failed())
                }
            }
            _ => Err(Error::NotAvail("comparison mode not supported by ElGamal context")),
        }
    }

    fn encrypt_dlp(&self, buf: &[u8], rng: &mut dyn rand_core::RngCore) -> Result<Vec<Vec<u8>>> {
        let k = random_below(&self.p, rng);
        let (c1, c2) = self.encrypt_pair(buf, &k);
        Ok(vec![c1, c2])
    }

    fn decrypt_dlp(&self, parts: &[&[u8]]) -> Result<Vec<u8>> {
        if parts.len() != 2 {
            return Err(Error::ArgError { parameter: "parts" });
        }
        self.decrypt_pair(parts[0], parts[1])
    }
}

/// Picks a uniform-ish value in `[2, modulus)` by rejection sampling over
/// modulus-sized byte strings. Slightly biased for non-power-of-two
/// moduli, same as cryptlib's own `generateBignum`-based ephemeral
/// exponent selection; not a concern at the bit sizes ElGamal uses here.
fn random_below(modulus: &BigUint, rng: &mut dyn rand_core::RngCore) -> BigUint {
    let bytes = ((modulus.bits() as usize) + 7) / 8;
    loop {
        let mut buf = vec![0u8; bytes.max(1)];
        rng.fill_bytes(&mut buf);
        let candidate = BigUint::from_bytes_be(&buf) % modulus;
        if candidate > BigUint::from(1u8) {
            return candidate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsa_sign_pads_short_components_to_fixed_width() {
        use dsa::{Components, KeySize, SigningKey};
        let mut rng = rand::rngs::mock::StepRng::new(0x7, 0x13);
        let components = Components::generate(&mut rng, KeySize::DSA_2048_256);
        let signing = SigningKey::generate(&mut rng, components);
        let ctx = DsaContext::from_private(signing);

        // Exercise many distinct hash inputs: `sig.r()`/`sig.s()` each
        // carry a ~1/256 chance of a high-order zero byte, which
        // `to_bytes_be()` would otherwise drop, shortening the native
        // `r ‖ s` encoding below `2 * DLP_COMPONENT_SIZE`.
        for i in 0u8..64 {
            let hash = [i; 20];
            let sig = ctx.sign(&hash).unwrap();
            assert_eq!(sig.len(), 2 * crate::sig::dlp::DLP_COMPONENT_SIZE);
        }
    }

    #[test]
    fn elgamal_round_trip() {
        // A small toy-sized prime field; real use picks a ≥2048-bit safe
        // prime, but the modular arithmetic itself is size-independent.
        let p = BigUint::from(2063u32);
        let g = BigUint::from(5u32);
        let x = BigUint::from(37u32);
        let y = g.modpow(&x, &p);
        let ctx_pub = ElGamalContext::from_public(p.clone(), g.clone(), y.clone());
        let ctx_priv = ElGamalContext::from_private(p, g, y, x);
        let msg = BigUint::from(42u32).to_bytes_be();
        let k = BigUint::from(11u32);
        let (c1, c2) = ctx_pub.encrypt_pair(&msg, &k);
        let recovered = ctx_priv.decrypt_pair(&c1, &c2).unwrap();
        assert_eq!(BigUint::from_bytes_be(&recovered), BigUint::from(42u32));
    }
}
