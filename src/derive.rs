//! Padding and key derivation: PKCS#1 v1.5, CMS double-CBC key wrap,
//! PKCS#5 v2 (PBKDF2), PKCS#12 KDF, OpenPGP S2K, and the SSL/TLS PRF.
//!
//! None of these are new cryptographic primitives — they are
//! constructions over the hash/cipher primitives in [`crate::provider`],
//! exactly as specified by their respective RFCs (3447, 5652, 2898,
//! 7292, 4880, 4346). Where the ecosystem has no off-the-shelf crate for
//! a construction (PKCS#12 KDF, S2K, the SSL/TLS PRF), it is hand-rolled
//! here rather than reimplemented ad hoc at every call site.

use crate::{Error, Result};
use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac, SimpleHmac};

/// Minimum accepted key size for any key read off the wire, per spec
/// ("typical" 40-bit floor, i.e. 5 bytes).
pub const MIN_KEYSIZE_BYTES: usize = 5;
/// Maximum key size this crate will derive or unwrap.
pub const MAX_KEYSIZE_BYTES: usize = 32;
/// Minimum slack required between an RSA modulus and a PKCS#1-wrapped
/// payload.
pub const PKCS1_MIN_PADDING: usize = 11;

// ---------------------------------------------------------------------
// PKCS#1 v1.5
// ---------------------------------------------------------------------

/// Coerces `bytes` to exactly `keysize` bytes: strips leading zeros while
/// longer than `keysize` (signed-integer encodings sometimes carry a
/// leading zero), left-pads with zeros while shorter. Rejects inputs
/// that, after stripping, are still shorter than 56 bytes — the legacy
/// floor below which no real RSA modulus exists.
pub fn adjust(bytes: &[u8], keysize: usize) -> Result<Vec<u8>> {
    let mut v = bytes.to_vec();
    while v.len() > keysize && v.first() == Some(&0) {
        v.remove(0);
    }
    if v.len() > keysize {
        return Err(Error::BadData("value longer than key size"));
    }
    if v.len() < 56 {
        return Err(Error::BadData("value too short after adjustment"));
    }
    while v.len() < keysize {
        v.insert(0, 0);
    }
    Ok(v)
}

/// Formats `payload` as a PKCS#1 v1.5 block of exactly `keysize` bytes:
/// `00 02 <random nonzero pad> 00 <payload>`.
pub fn pkcs1_wrap<R: rand_core::RngCore>(
    payload: &[u8],
    keysize: usize,
    rng: &mut R,
) -> Result<Vec<u8>> {
    if payload.len() + PKCS1_MIN_PADDING > keysize {
        return Err(Error::Overflow);
    }
    let pad_len = keysize - payload.len() - 3;
    let mut pad = vec![0u8; pad_len];
    for b in pad.iter_mut() {
        loop {
            let candidate = (rng.next_u32() & 0xff) as u8;
            if candidate != 0 {
                *b = candidate;
                break;
            }
        }
    }
    let mut out = Vec::with_capacity(keysize);
    out.push(0x00);
    out.push(0x02);
    out.extend_from_slice(&pad);
    out.push(0x00);
    out.extend_from_slice(payload);
    Ok(out)
}

/// Strips a PKCS#1 v1.5 block, verifying `00 02`, at least 8 nonzero
/// pad bytes, a terminating `00`, and a payload of legal minimum length.
pub fn pkcs1_unwrap(block: &[u8]) -> Result<Vec<u8>> {
    if block.len() < 11 || block[0] != 0x00 || block[1] != 0x02 {
        return Err(Error::BadData("bad PKCS#1 header"));
    }
    let mut i = 2;
    let pad_start = i;
    while i < block.len() && block[i] != 0x00 {
        i += 1;
    }
    if i - pad_start < 8 || i >= block.len() {
        return Err(Error::BadData("bad PKCS#1 padding"));
    }
    let payload = &block[i + 1..];
    if payload.len() < MIN_KEYSIZE_BYTES {
        return Err(Error::BadData("PKCS#1 payload too short"));
    }
    Ok(payload.to_vec())
}

/// The PGP variant of PKCS#1 wrap: a 1-byte session-key algorithm id is
/// prepended to the payload and a 2-byte big-endian checksum appended,
/// before the whole thing is padded as above.
pub fn pkcs1_wrap_pgp<R: rand_core::RngCore>(
    algo_id: u8,
    session_key: &[u8],
    keysize: usize,
    rng: &mut R,
) -> Result<Vec<u8>> {
    let checksum = pgp_checksum(session_key);
    let mut payload = Vec::with_capacity(session_key.len() + 3);
    payload.push(algo_id);
    payload.extend_from_slice(session_key);
    payload.extend_from_slice(&checksum.to_be_bytes());
    pkcs1_wrap(&payload, keysize, rng)
}

/// Inverse of [`pkcs1_wrap_pgp`]: unwraps the block, then splits off the
/// algorithm id and verifies the trailing checksum.
pub fn pkcs1_unwrap_pgp(block: &[u8]) -> Result<(u8, Vec<u8>)> {
    let payload = pkcs1_unwrap(block)?;
    if payload.len() < 3 {
        return Err(Error::BadData("PGP PKCS#1 payload too short"));
    }
    let algo_id = payload[0];
    let session_key = payload[1..payload.len() - 2].to_vec();
    let checksum = u16::from_be_bytes([payload[payload.len() - 2], payload[payload.len() - 1]]);
    if pgp_checksum(&session_key) != checksum {
        return Err(Error::BadData("PGP session-key checksum mismatch"));
    }
    Ok((algo_id, session_key))
}

/// The simple additive checksum PGP uses to catch transport corruption
/// of a session key — not a security boundary, since the surrounding
/// PKCS#1 padding check is what actually gates acceptance.
pub fn pgp_checksum(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

// ---------------------------------------------------------------------
// CMS key wrap (double CBC)
// ---------------------------------------------------------------------

enum AesCbcKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

fn aes_key_from_slice(kek: &[u8]) -> Result<AesCbcKey> {
    match kek.len() {
        16 => {
            let mut k = [0u8; 16];
            k.copy_from_slice(kek);
            Ok(AesCbcKey::Aes128(k))
        }
        24 => {
            let mut k = [0u8; 24];
            k.copy_from_slice(kek);
            Ok(AesCbcKey::Aes192(k))
        }
        32 => {
            let mut k = [0u8; 32];
            k.copy_from_slice(kek);
            Ok(AesCbcKey::Aes256(k))
        }
        _ => Err(Error::ArgError { parameter: "kek" }),
    }
}

fn cbc_encrypt_blocks(kek: &AesCbcKey, iv: &[u8; 16], blocks: &mut [u8]) -> Result<()> {
    macro_rules! run {
        ($cipher:ty, $key:expr) => {{
            let mut enc = <cbc::Encryptor<$cipher>>::new($key.into(), iv.into());
            for chunk in blocks.chunks_mut(16) {
                enc.encrypt_block_mut(chunk.into());
            }
        }};
    }
    match kek {
        AesCbcKey::Aes128(k) => run!(Aes128, k),
        AesCbcKey::Aes192(k) => run!(Aes192, k),
        AesCbcKey::Aes256(k) => run!(Aes256, k),
    }
    Ok(())
}

fn cbc_decrypt_blocks(kek: &AesCbcKey, iv: &[u8; 16], blocks: &mut [u8]) -> Result<()> {
    macro_rules! run {
        ($cipher:ty, $key:expr) => {{
            let mut dec = <cbc::Decryptor<$cipher>>::new($key.into(), iv.into());
            for chunk in blocks.chunks_mut(16) {
                dec.decrypt_block_mut(chunk.into());
            }
        }};
    }
    match kek {
        AesCbcKey::Aes128(k) => run!(Aes128, k),
        AesCbcKey::Aes192(k) => run!(Aes192, k),
        AesCbcKey::Aes256(k) => run!(Aes256, k),
    }
    Ok(())
}

/// Wraps `key` under `kek`/`iv` using the CMS double-CBC construction:
/// `[len][~k0][~k1][~k2][key][random padding]` is CBC-encrypted once,
/// then CBC-encrypted again with the IV set to the last ciphertext
/// block of the first pass.
pub fn cms_keywrap<R: rand_core::RngCore>(
    key: &[u8],
    kek: &[u8],
    iv: &[u8; 16],
    rng: &mut R,
) -> Result<Vec<u8>> {
    if key.len() < MIN_KEYSIZE_BYTES || key.len() > MAX_KEYSIZE_BYTES {
        return Err(Error::ArgError { parameter: "key" });
    }
    let kek = aes_key_from_slice(kek)?;
    let mut block = Vec::with_capacity(4 + key.len() + 16);
    block.push(key.len() as u8);
    block.push(!key[0]);
    block.push(!key[1]);
    block.push(!key[2]);
    block.extend_from_slice(key);
    let min_len = crate::cursor::round_up(block.len(), 16).max(32);
    while block.len() < min_len {
        block.push((rng.next_u32() & 0xff) as u8);
    }

    cbc_encrypt_blocks(&kek, iv, &mut block)?;
    let n = block.len() / 16;
    let mut iv2 = [0u8; 16];
    iv2.copy_from_slice(&block[(n - 1) * 16..n * 16]);
    cbc_encrypt_blocks(&kek, &iv2, &mut block)?;
    Ok(block)
}

/// Inverts [`cms_keywrap`]: using the second-to-last ciphertext block as
/// the IV, decrypts the last block; using that plaintext block as the
/// IV, decrypts blocks `0..n-2`; finally re-decrypts the whole buffer
/// under the original IV. Validates the length prefix and the
/// XOR-complement check bytes before returning the key.
pub fn cms_keyunwrap(wrapped: &[u8], kek: &[u8], iv: &[u8; 16]) -> Result<Vec<u8>> {
    if wrapped.len() % 16 != 0 || wrapped.len() < 32 {
        return Err(Error::BadData("CMS wrap length not block-aligned"));
    }
    let kek = aes_key_from_slice(kek)?;
    let mut buf = wrapped.to_vec();
    let n = buf.len() / 16;

    let iv_last: [u8; 16] = buf[(n - 2) * 16..(n - 1) * 16].try_into().unwrap();
    let mut last_block = buf[(n - 1) * 16..n * 16].to_vec();
    cbc_decrypt_blocks(&kek, &iv_last, &mut last_block)?;
    buf[(n - 1) * 16..n * 16].copy_from_slice(&last_block);

    let iv_head: [u8; 16] = last_block[..16].try_into().unwrap();
    let mut head = buf[..(n - 1) * 16].to_vec();
    cbc_decrypt_blocks(&kek, &iv_head, &mut head)?;
    buf[..(n - 1) * 16].copy_from_slice(&head);

    cbc_decrypt_blocks(&kek, iv, &mut buf)?;

    let len = buf[0] as usize;
    if len < MIN_KEYSIZE_BYTES || len > MAX_KEYSIZE_BYTES || len + 4 > buf.len() {
        return Err(Error::BadData("CMS wrap length field out of range"));
    }
    if buf[1] != !buf[4] || buf[2] != !buf[5] || buf[3] != !buf[6] {
        return Err(Error::BadData("CMS wrap check bytes mismatch"));
    }
    Ok(buf[4..4 + len].to_vec())
}

// ---------------------------------------------------------------------
// PKCS#5 v2 / PBKDF2
// ---------------------------------------------------------------------

/// Derives `out_len` bytes via PBKDF2-HMAC-SHA-1, matching the RFC 6070
/// / RFC 2898 construction the legacy `derivePKCS5` hand-rolled with a
/// cached "initial hash info" snapshot — the `pbkdf2` crate already
/// implements that optimisation internally, so we simply call it.
pub fn pbkdf2_sha1(password: &[u8], salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; out_len];
    // `Sha1CD` has no block-level/`CoreProxy` API, so `Hmac<D>` can't drive
    // it; `SimpleHmac<D>` only needs `Digest + BlockSizeUser`.
    pbkdf2::pbkdf2::<SimpleHmac<crate::algorithm::Sha1CdDigest>>(password, salt, iterations, &mut out)
        .expect("HMAC can be initialized with any key length");
    out
}

// ---------------------------------------------------------------------
// PKCS#12 KDF
// ---------------------------------------------------------------------

const PKCS12_BLOCK: usize = 64;

/// Diversifier ids for the three PKCS#12 KDF purposes. Callers select one
/// of these as the first byte of the `salt` buffer passed to
/// [`pkcs12_kdf`] — cryptlib's `derivePKCS12` takes the diversifier as
/// `salt[0]`, not as a separate parameter, and this module keeps that
/// convention rather than inventing a third argument.
pub mod pkcs12_id {
    /// Key material.
    pub const KEY: u8 = 1;
    /// Initialization vector.
    pub const IV: u8 = 2;
    /// MAC key.
    pub const MAC: u8 = 3;
}

fn utf16be_null_terminated(password: &str) -> Vec<u8> {
    let mut out: Vec<u8> = password.encode_utf16().flat_map(|c| c.to_be_bytes()).collect();
    out.extend_from_slice(&[0, 0]);
    out
}

fn expand_to_block(data: &[u8], block_len: usize) -> Vec<u8> {
    if data.is_empty() {
        return vec![0u8; block_len];
    }
    let mut out = Vec::with_capacity(block_len);
    while out.len() < block_len {
        let take = (block_len - out.len()).min(data.len());
        out.extend_from_slice(&data[..take]);
    }
    out
}

fn sha1_digest(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1CD::default();
    digest::Digest::update(&mut hasher, data);
    digest::Digest::finalize(hasher).to_vec()
}

/// Derives key material via the PKCS#12 (RFC 7292 Appendix B) KDF,
/// following `mech_drv.c`'s `derivePKCS12` exactly: the hash is always
/// `CRYPT_ALGO_SHA` (SHA-1), never SHA-2, and the diversifier byte is
/// `salt[0]` rather than a separate argument — `salt[1..]` is what gets
/// expanded into the salt block (see [`pkcs12_id`] for the diversifier
/// values cryptlib defines). `salt` must be at least one byte.
pub fn pkcs12_kdf(password: &str, salt: &[u8], iterations: u32, out_len: usize) -> Vec<u8> {
    let diversifier = vec![salt[0]; PKCS12_BLOCK];
    let salt_expanded = expand_to_block(&salt[1..], PKCS12_BLOCK);
    let pw_bytes = utf16be_null_terminated(password);
    let pw_expanded = expand_to_block(&pw_bytes, round_up_to(pw_bytes.len().max(1), PKCS12_BLOCK));

    let mut i_block = salt_expanded;
    i_block.extend_from_slice(&pw_expanded);

    let mut output = Vec::with_capacity(out_len);
    while output.len() < out_len {
        let mut dsp = diversifier.clone();
        dsp.extend_from_slice(&i_block);

        let mut a = sha1_digest(&dsp);
        for _ in 1..iterations {
            a = sha1_digest(&a);
        }
        output.extend_from_slice(&a);

        let b = expand_to_block(&a, PKCS12_BLOCK);
        for chunk in i_block.chunks_mut(PKCS12_BLOCK) {
            add_with_carry(chunk, &b);
        }
    }
    output.truncate(out_len);
    output
}

fn round_up_to(n: usize, to: usize) -> usize {
    (n + to - 1) / to * to
}

/// `I_j ← (I_j + B + 1) mod 2^512`, as big-endian byte arrays of equal
/// length.
fn add_with_carry(i_block: &mut [u8], b: &[u8]) {
    let mut carry: u16 = 1;
    for k in (0..i_block.len()).rev() {
        let sum = i_block[k] as u16 + b[k] as u16 + carry;
        i_block[k] = (sum & 0xff) as u8;
        carry = sum >> 8;
    }
}

// ---------------------------------------------------------------------
// OpenPGP S2K
// ---------------------------------------------------------------------

/// Converts an S2K "iteration count" byte (4-bit exponent, 4-bit
/// mantissa) to the number of bytes it specifies should be hashed.
pub fn s2k_count_from_byte(byte: u8) -> u32 {
    let exponent = (byte >> 4) as u32;
    let mantissa = (byte & 0x0f) as u32;
    (16 + mantissa) << exponent
}

/// Inverse of [`s2k_count_from_byte`]. `count` must be a multiple of 16;
/// the closest representable value at or above `count` is chosen.
pub fn s2k_byte_from_count(count: u32) -> u8 {
    for exponent in 0u32..16 {
        for mantissa in 0u32..16 {
            if (16 + mantissa) << exponent >= count {
                return ((exponent << 4) | mantissa) as u8;
            }
        }
    }
    0xff
}

/// Derives a key via OpenPGP's salted-and-iterated S2K (spec 3). `count`
/// is the number of *bytes hashed*, not a round count: `salt ‖ password`
/// is hashed repeatedly and the concatenation truncated to exactly
/// `count` bytes. If the hash's native output is smaller than the
/// requested key size, a second pass is run seeded with one `0x00` byte.
pub fn pgp_s2k_salted_iterated(
    hash: crate::algorithm::HashAlgorithm,
    salt: &[u8; 8],
    count: u32,
    password: &[u8],
    out_len: usize,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    let mut seed_zero = false;
    while out.len() < out_len {
        let mut hasher = hash.hasher();
        if seed_zero {
            hasher.update(&[0u8]);
        }
        let mut remaining = count as usize;
        let unit = salt.len() + password.len();
        while remaining > 0 {
            let take = unit.min(remaining);
            let mut block = Vec::with_capacity(unit);
            block.extend_from_slice(salt);
            block.extend_from_slice(password);
            hasher.update(&block[..take]);
            remaining -= take;
        }
        out.extend_from_slice(&hasher.finalize_reset());
        seed_zero = true;
    }
    out.truncate(out_len);
    out
}

// ---------------------------------------------------------------------
// SSL 3.0 / TLS 1.1 PRF
// ---------------------------------------------------------------------

use md5::Md5;
use sha1collisiondetection::Sha1CD;

/// The SSL 3.0 key-derivation PRF: per 16-byte output block `k` (0-indexed),
/// `SHA1('A' repeated k+1 times ‖ key ‖ salt)` feeds `MD5(key ‖ SHA1-out)`.
pub fn ssl_prf(key: &[u8], salt: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    let mut k = 0usize;
    while out.len() < out_len {
        let prefix = vec![b'A' + k as u8; k + 1];
        let mut sha = Sha1CD::default();
        digest::Digest::update(&mut sha, &prefix);
        digest::Digest::update(&mut sha, key);
        digest::Digest::update(&mut sha, salt);
        let sha_out = digest::Digest::finalize(sha);

        let mut md5 = Md5::default();
        digest::Digest::update(&mut md5, key);
        digest::Digest::update(&mut md5, &sha_out);
        out.extend_from_slice(&digest::Digest::finalize(md5));
        k += 1;
    }
    out.truncate(out_len);
    out
}

fn p_hash<D: Mac + Clone>(mut mac: D, seed: &[u8], out_len: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(out_len);
    let mut a = {
        let mut m = mac.clone();
        m.update(seed);
        m.finalize().into_bytes().to_vec()
    };
    while out.len() < out_len {
        let mut m = mac.clone();
        m.update(&a);
        m.update(seed);
        out.extend_from_slice(&m.finalize().into_bytes());

        let mut next_a = mac.clone();
        next_a.update(&a);
        a = next_a.finalize().into_bytes().to_vec();
    }
    out.truncate(out_len);
    out
}

/// The TLS 1.1 PRF: splits `secret` into two halves (overlapping by one
/// byte if the length is odd), runs `P_MD5` over one half and `P_SHA1`
/// over the other, and XORs the two outputs together.
pub fn tls_prf(secret: &[u8], label_and_seed: &[u8], out_len: usize) -> Vec<u8> {
    let half = (secret.len() + 1) / 2;
    let s1 = &secret[..half];
    let s2 = &secret[secret.len() - half..];

    let md5_mac = <Hmac<Md5>>::new_from_slice(s1).expect("any key length is valid for HMAC");
    let sha1_mac = <SimpleHmac<crate::algorithm::Sha1CdDigest>>::new_from_slice(s2)
        .expect("any key length is valid for HMAC");

    let p_md5 = p_hash(md5_mac, label_and_seed, out_len);
    let p_sha1 = p_hash(sha1_mac, label_and_seed, out_len);

    p_md5
        .iter()
        .zip(p_sha1.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbkdf2_rfc6070_vector() {
        let out = pbkdf2_sha1(b"password", b"salt", 1, 20);
        assert_eq!(
            out,
            hex("0c60c80f961f0e71f3a9b524af6012062fe037a6")
        );
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }

    #[test]
    fn adjust_pads_and_strips() {
        let short = adjust(&[1, 2, 3], 8).unwrap();
        assert_eq!(short, vec![0, 0, 0, 0, 0, 1, 2, 3]);
        let mut long = vec![0u8; 60];
        long[0] = 0;
        let out = adjust(&long, 56).unwrap();
        assert_eq!(out.len(), 56);
    }

    #[test]
    fn adjust_rejects_too_short() {
        assert!(adjust(&[1, 2, 3], 64).is_err());
    }

    #[test]
    fn pkcs1_round_trip() {
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let payload = b"0123456789abcdef";
        let wrapped = pkcs1_wrap(payload, 256, &mut rng).unwrap();
        assert_eq!(wrapped.len(), 256);
        assert_eq!(&wrapped[0..2], &[0x00, 0x02]);
        let out = pkcs1_unwrap(&wrapped).unwrap();
        assert_eq!(out, payload);
    }

    #[test]
    fn pkcs1_wrap_rejects_oversized_payload() {
        let mut rng = rand::rngs::mock::StepRng::new(7, 13);
        let payload = vec![0u8; 246];
        assert!(pkcs1_wrap(&payload, 256, &mut rng).is_err());
    }

    #[test]
    fn s2k_count_byte_round_trips_approximately() {
        let byte = 0x60u8;
        let count = s2k_count_from_byte(byte);
        assert_eq!(count, (16 + 0) << 6);
        assert_eq!(s2k_byte_from_count(count), byte);
    }

    // Property 5 (spec.md §8): `spec=3, salt=0x0102..08, iter_byte=0x60,
    // pw="abc"` must match GPG's salted-and-iterated S2K output. The
    // count byte decodes to 1024 bytes hashed, which is less than one
    // full `salt‖password` unit repeated 94 times (1034 bytes), so this
    // vector also exercises the final partial-unit truncation.
    #[test]
    fn s2k_salted_iterated_matches_gpg_vector() {
        let salt = [0x01u8, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let count = s2k_count_from_byte(0x60);
        assert_eq!(count, 1024);
        let key = pgp_s2k_salted_iterated(
            crate::algorithm::HashAlgorithm::Sha1,
            &salt,
            count,
            b"abc",
            20,
        );
        assert_eq!(
            key,
            hex("bc8f9285cd31919515cab8bf81f5fb6e69313d63")
        );
    }

    #[test]
    fn cms_keywrap_round_trips_and_checks_complement_bytes() {
        let mut rng = rand::rngs::mock::StepRng::new(3, 5);
        let key = [0x11u8; 16];
        let kek = [0x22u8; 16];
        let iv = [0u8; 16];
        let wrapped = cms_keywrap(&key, &kek, &iv, &mut rng).unwrap();
        let unwrapped = cms_keyunwrap(&wrapped, &kek, &iv).unwrap();
        assert_eq!(unwrapped, key);
    }

    #[test]
    fn pkcs12_kdf_is_deterministic_and_key_dependent() {
        let mut salt = vec![pkcs12_id::KEY];
        salt.extend_from_slice(&[0xaa; 8]);
        let a = pkcs12_kdf("hunter2", &salt, 1000, 16);
        let b = pkcs12_kdf("hunter2", &salt, 1000, 16);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);

        let different_password = pkcs12_kdf("hunter3", &salt, 1000, 16);
        assert_ne!(a, different_password);

        let mut iv_salt = salt.clone();
        iv_salt[0] = pkcs12_id::IV;
        let different_diversifier = pkcs12_kdf("hunter2", &iv_salt, 1000, 16);
        assert_ne!(a, different_diversifier);

        // Output longer than one SHA-1 block (20 bytes) exercises the
        // `I_j` carry-update loop running more than once.
        let long = pkcs12_kdf("hunter2", &salt, 1000, 40);
        assert_eq!(long.len(), 40);
        assert_eq!(&long[..16], &a[..]);
    }

    // Property 3 (spec.md §8): `adjust` always yields exactly `keysize`
    // bytes, or rejects inputs too short to be a real modulus.
    quickcheck! {
        fn adjust_law(tail: Vec<u8>, keysize_seed: u8) -> bool {
            // Keep keysize in a realistic RSA-modulus range (56..=512 bytes)
            // so the "too short after stripping" rejection path is exercised
            // as well as the padding path.
            let keysize = 56 + (keysize_seed as usize % 200);
            // Prepend a handful of leading zeros to also exercise the
            // strip-while-longer-than-keysize branch.
            let mut bytes = vec![0u8; tail.len() % 8];
            bytes.extend_from_slice(&tail);

            match adjust(&bytes, keysize) {
                Ok(out) => {
                    let mut stripped = bytes.as_slice();
                    while stripped.len() > keysize && stripped.first() == Some(&0) {
                        stripped = &stripped[1..];
                    }
                    out.len() == keysize && out.ends_with(stripped)
                }
                Err(_) => {
                    let mut stripped = bytes.as_slice();
                    while stripped.len() > keysize && stripped.first() == Some(&0) {
                        stripped = &stripped[1..];
                    }
                    stripped.len() < 56 || stripped.len() > keysize
                }
            }
        }
    }

    // Property 1 (spec.md §8): for any payload that fits the padding
    // slack, `unwrap(wrap(p)) == p`; oversized payloads are rejected.
    quickcheck! {
        fn pkcs1_round_trip_or_overflow(payload: Vec<u8>, keysize_seed: u8) -> bool {
            let keysize = 64 + (keysize_seed as usize % 192); // 64..=255 bytes
            let mut rng = rand::rngs::mock::StepRng::new(0x9e3779b9, 0x61c88647);
            match pkcs1_wrap(&payload, keysize, &mut rng) {
                Ok(wrapped) => {
                    wrapped.len() == keysize
                        && pkcs1_unwrap(&wrapped).map(|p| p == payload).unwrap_or(false)
                }
                Err(_) => payload.len() + PKCS1_MIN_PADDING > keysize,
            }
        }
    }

    // Property 2 (spec.md §8): for any legal-size session key, CMS
    // double-CBC wrap/unwrap round-trips and the check bytes invert the
    // first three key bytes.
    quickcheck! {
        fn cms_keywrap_round_trip(key_seed: Vec<u8>) -> bool {
            let mut key = key_seed;
            key.resize(16.max(key.len().min(32)), 0x42);
            if key.len() < MIN_KEYSIZE_BYTES {
                return true;
            }
            let mut rng = rand::rngs::mock::StepRng::new(0x1234, 0x9abc);
            let kek = [0x5au8; 16];
            let iv = [0u8; 16];
            let wrapped = cms_keywrap(&key, &kek, &iv, &mut rng).unwrap();
            cms_keyunwrap(&wrapped, &kek, &iv).unwrap() == key
        }
    }
}
