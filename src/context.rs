//! Abstract context interface: the capability seam between this crate's
//! codecs and whatever backs a key, hash, or cipher.
//!
//! The legacy design speaks to every context through a single
//! message-dispatch function (`krnlSendMessage(handle, opcode, params)`).
//! We replace that with a small trait set instead: callers hold a
//! `&dyn KeyCtx`/`&dyn HashCtx` and the compiler enforces which messages
//! a given context answers to, rather than every call site checking an
//! opcode was handled.

use crate::algorithm::{AlgoClass, CryptAlgo, HashAlgorithm};
use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};

/// The comparison mode for [`KeyCtx::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareMode {
    /// Native (cryptlib) key-id comparison.
    KeyId,
    /// PGP v2/v3 key-id comparison (low 64 bits of an MD5 fingerprint).
    KeyIdPgp,
    /// OpenPGP v4 key-id comparison (low 64 bits of a SHA-1 fingerprint).
    KeyIdOpenPgp,
    /// `IssuerAndSerialNumber` comparison (CMS).
    IssuerAndSerial,
    /// Raw hash-value comparison.
    Hash,
}

/// A scoped guard over a context's IV-mutation lock.
///
/// Every operation that loads or generates an IV must hold one of these
/// for the duration of the work; `Drop` releases the lock unconditionally,
/// so there is no exit path (including early returns via `?`) that leaks
/// a held lock the way a hand-paired `set_attr(locked, true/false)` can.
pub struct LockGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> LockGuard<'a> {
    /// Acquires the lock, failing with [`Error::Permission`] if it is
    /// already held.
    pub fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        if flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Permission);
        }
        Ok(LockGuard { flag })
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// An abstract handle to a key or bulk-cipher context.
///
/// Implementations back this with real key material (see
/// [`crate::provider`]); the mechanism and codec layers only ever see
/// this trait, never the concrete key type, so that swapping in another
/// provider (an out-of-process device, say) requires no codec changes.
pub trait KeyCtx {
    /// The native algorithm identifier.
    fn algorithm(&self) -> CryptAlgo;

    /// The algorithm class this context belongs to.
    fn algo_class(&self) -> AlgoClass {
        self.algorithm().class()
    }

    /// Key size in bytes (modulus size for PKC algorithms, key length for
    /// conventional ciphers).
    fn key_size(&self) -> usize;

    /// IV size in bytes; zero for algorithms with no IV (stream-like or
    /// public-key contexts).
    fn iv_size(&self) -> usize {
        0
    }

    /// The lock flag backing this context's [`LockGuard`].
    fn lock_flag(&self) -> &AtomicBool;

    /// Acquires the IV-mutation lock for the duration of the returned
    /// guard's lifetime.
    fn lock(&self) -> Result<LockGuard<'_>> {
        LockGuard::acquire(self.lock_flag())
    }

    /// Generates a fresh IV. Must only be called while the context's
    /// lock is held; implementations that require the lock return
    /// [`Error::Permission`] otherwise.
    fn gen_iv(&self, _guard: &LockGuard<'_>) -> Result<Vec<u8>> {
        Err(Error::NotAvail("no IV for this algorithm"))
    }

    /// Encrypts `buf` in place using this context's key (public-key
    /// encrypt, or conventional-cipher encrypt given an externally
    /// managed IV).
    fn encrypt(&self, buf: &[u8]) -> Result<Vec<u8>>;

    /// Decrypts `buf`.
    fn decrypt(&self, buf: &[u8]) -> Result<Vec<u8>>;

    /// Produces a signature over `hash` (already-finalised digest bytes).
    fn sign(&self, _hash: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("context cannot sign"))
    }

    /// Verifies `sig` against `hash`.
    fn verify(&self, _hash: &[u8], _sig: &[u8]) -> Result<()> {
        Err(Error::NotAvail("context cannot verify"))
    }

    /// Compares this context's identity against `bytes` under `mode`.
    /// A generic internal mismatch is reported as [`Error::WrongKey`]
    /// directly; callers never see a bare "compare failed" they'd have
    /// to translate themselves.
    fn compare(&self, mode: CompareMode, bytes: &[u8]) -> Result<()>;

    /// Raw key material, when this context exposes it (session/
    /// conventional keys only; PKC contexts return `NotAvail`).
    fn key_bytes(&self) -> Result<Vec<u8>> {
        Err(Error::NotAvail("no raw key material"))
    }

    /// The unpadded public-key primitive (RSA modexp with the public
    /// exponent). `buf` must already be exactly [`KeyCtx::key_size`]
    /// bytes — padding is the mechanism layer's job, not the context's.
    /// Used both for key-transport encryption and for PKCS#1 signature
    /// verification, which share the same underlying transform.
    fn raw_public(&self, _buf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("no raw public transform"))
    }

    /// The unpadded private-key primitive (RSA modexp with the private
    /// exponent). Used both for key-transport decryption and for
    /// PKCS#1 signature creation.
    fn raw_private(&self, _buf: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("no raw private transform"))
    }

    /// DLP public-key encryption, producing one wire component per MPI
    /// (ElGamal: the `(c1, c2)` pair). RSA contexts use
    /// [`KeyCtx::raw_public`] instead and leave this at its default.
    fn encrypt_dlp(&self, _buf: &[u8], _rng: &mut dyn rand_core::RngCore) -> Result<Vec<Vec<u8>>> {
        Err(Error::NotAvail("not a DLP encryption context"))
    }

    /// Inverse of [`KeyCtx::encrypt_dlp`].
    fn decrypt_dlp(&self, _parts: &[&[u8]]) -> Result<Vec<u8>> {
        Err(Error::NotAvail("not a DLP encryption context"))
    }
}

/// An abstract hash-state handle.
///
/// `update` may be called repeatedly; `finalize` consumes the context
/// (mirroring the legacy `hash(empty)` finalisation convention, but
/// enforced by ownership rather than by a sentinel empty-buffer call).
pub trait HashCtx {
    /// The hash algorithm this context implements.
    fn algorithm(&self) -> HashAlgorithm;

    /// Feeds more bytes into the running hash.
    fn update(&mut self, buf: &[u8]);

    /// Finalises the hash and returns the digest.
    fn finalize(self: Box<Self>) -> Vec<u8>;
}

/// A certificate chain acting as a signing or decryption context.
///
/// Extends [`KeyCtx`] with leaf selection: acquiring the lock also
/// pins the chain's internal cursor to the first (leaf) certificate for
/// the duration of the guard, matching the legacy requirement that
/// cert-chain selection and IV locking share one critical section.
pub trait CertChain: KeyCtx {
    /// Locks the chain and selects the leaf certificate, returning both
    /// the guard and the leaf's `KeyCtx`.
    fn lock_and_select_leaf(&self) -> Result<(LockGuard<'_>, &dyn KeyCtx)>;

    /// The leaf certificate's `issuerAndSerialNumber` DER bytes, used by
    /// CMS/S-MIME key-transport and signature codecs.
    fn issuer_and_serial(&self) -> Result<Vec<u8>>;
}
