//! Hash and HMAC primitives indexed by COSE algorithm identifier.

use core::fmt;
use digest::Digest;
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha384, Sha512};

use super::{Error, Result};

/// ECDSA w/ SHA-256 on P-256.
pub const COSE_ALGORITHM_ES256: i32 = -7;
/// HMAC w/ SHA-256, full 32 byte tag.
pub const COSE_ALGORITHM_HMAC256: i32 = 5;
/// HMAC w/ SHA-384, full 48 byte tag.
pub const COSE_ALGORITHM_HMAC384: i32 = 6;
/// HMAC w/ SHA-512, full 64 byte tag.
pub const COSE_ALGORITHM_HMAC512: i32 = 7;
pub const COSE_ALGORITHM_SHA_256: i32 = -16;
pub const COSE_ALGORITHM_SHA_384: i32 = -43;
pub const COSE_ALGORITHM_SHA_512: i32 = -44;

/// Largest tag any supported MAC algorithm produces.
pub const HMAC_TAG_MAX_SIZE: usize = 64;
/// Largest signature any supported signing algorithm produces.
pub const SIGNATURE_MAX_SIZE: usize = 64;

/// Tag size of a MAC algorithm, `None` if unsupported.
pub fn tag_size(cose_alg_id: i32) -> Option<usize> {
    match cose_alg_id {
        COSE_ALGORITHM_HMAC256 => Some(32),
        COSE_ALGORITHM_HMAC384 => Some(48),
        COSE_ALGORITHM_HMAC512 => Some(64),
        _ => None,
    }
}

/// The hash underlying a MAC algorithm, `None` if unsupported.
pub fn hmac_to_hash_alg(cose_alg_id: i32) -> Option<i32> {
    match cose_alg_id {
        COSE_ALGORITHM_HMAC256 => Some(COSE_ALGORITHM_SHA_256),
        COSE_ALGORITHM_HMAC384 => Some(COSE_ALGORITHM_SHA_384),
        COSE_ALGORITHM_HMAC512 => Some(COSE_ALGORITHM_SHA_512),
        _ => None,
    }
}

/// Signature size of a signing algorithm, `None` if unsupported.
pub fn sig_size(cose_alg_id: i32) -> Option<usize> {
    match cose_alg_id {
        COSE_ALGORITHM_ES256 => Some(64),
        _ => None,
    }
}

/// Symmetric key bytes, borrowed from the caller for one operation.
#[derive(Clone, Copy)]
pub struct SymmetricKey<'k> {
    bytes: &'k [u8],
}

impl<'k> SymmetricKey<'k> {
    pub fn new(bytes: &'k [u8]) -> Self {
        SymmetricKey { bytes }
    }

    fn checked(self) -> Result<&'k [u8]> {
        if self.bytes.is_empty() {
            return Err(Error::InvalidKey);
        }
        Ok(self.bytes)
    }
}

impl fmt::Debug for SymmetricKey<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymmetricKey({} bytes)", self.bytes.len())
    }
}

fn copy_out(out: &[u8], buf: &mut [u8]) -> Result<usize> {
    let have = buf.len();
    let dst = buf.get_mut(..out.len()).ok_or(Error::SigBufferSize {
        have,
        want: out.len(),
    })?;
    dst.copy_from_slice(out);
    Ok(out.len())
}

/// A running hash.
#[derive(Clone)]
pub enum HashCtx {
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl HashCtx {
    pub fn start(cose_hash_alg_id: i32) -> Result<Self> {
        match cose_hash_alg_id {
            COSE_ALGORITHM_SHA_256 => Ok(HashCtx::Sha256(Sha256::new())),
            COSE_ALGORITHM_SHA_384 => Ok(HashCtx::Sha384(Sha384::new())),
            COSE_ALGORITHM_SHA_512 => Ok(HashCtx::Sha512(Sha512::new())),
            _ => {
                log::debug!("unsupported hash algorithm {}", cose_hash_alg_id);
                Err(Error::UnsupportedHash)
            }
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            HashCtx::Sha256(h) => h.update(data),
            HashCtx::Sha384(h) => h.update(data),
            HashCtx::Sha512(h) => h.update(data),
        }
    }

    /// Writes the digest to the front of `buf`, returning its length.
    pub fn finish(self, buf: &mut [u8]) -> Result<usize> {
        match self {
            HashCtx::Sha256(h) => copy_out(&h.finalize(), buf),
            HashCtx::Sha384(h) => copy_out(&h.finalize(), buf),
            HashCtx::Sha512(h) => copy_out(&h.finalize(), buf),
        }
    }
}

/// A running HMAC, either producing or checking a tag.
#[derive(Clone)]
pub enum HmacCtx {
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl HmacCtx {
    pub fn sign_setup(key: SymmetricKey<'_>, cose_alg_id: i32) -> Result<Self> {
        let key = key.checked()?;
        let ctx = match cose_alg_id {
            COSE_ALGORITHM_HMAC256 => Hmac::<Sha256>::new_from_slice(key).map(HmacCtx::Sha256),
            COSE_ALGORITHM_HMAC384 => Hmac::<Sha384>::new_from_slice(key).map(HmacCtx::Sha384),
            COSE_ALGORITHM_HMAC512 => Hmac::<Sha512>::new_from_slice(key).map(HmacCtx::Sha512),
            _ => {
                log::debug!("unsupported MAC algorithm {}", cose_alg_id);
                return Err(Error::UnsupportedSigningAlg);
            }
        };
        ctx.map_err(|_| Error::InvalidKey)
    }

    /// Verification runs the same computation; only the finish differs.
    pub fn verify_setup(key: SymmetricKey<'_>, cose_alg_id: i32) -> Result<Self> {
        Self::sign_setup(key, cose_alg_id)
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            HmacCtx::Sha256(m) => m.update(data),
            HmacCtx::Sha384(m) => m.update(data),
            HmacCtx::Sha512(m) => m.update(data),
        }
    }

    /// Writes the tag to the front of `buf`, returning its length.
    pub fn sign_finish(self, buf: &mut [u8]) -> Result<usize> {
        match self {
            HmacCtx::Sha256(m) => copy_out(&m.finalize().into_bytes(), buf),
            HmacCtx::Sha384(m) => copy_out(&m.finalize().into_bytes(), buf),
            HmacCtx::Sha512(m) => copy_out(&m.finalize().into_bytes(), buf),
        }
    }

    /// Compares the computed tag with `tag` in constant time.
    pub fn verify_finish(self, tag: &[u8]) -> Result<()> {
        let checked = match self {
            HmacCtx::Sha256(m) => m.verify_slice(tag),
            HmacCtx::Sha384(m) => m.verify_slice(tag),
            HmacCtx::Sha512(m) => m.verify_slice(tag),
        };
        checked.map_err(|_| Error::MacValidationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn algorithm_resolution() {
        assert_eq!(tag_size(COSE_ALGORITHM_HMAC384), Some(48));
        assert_eq!(tag_size(4), None);
        assert_eq!(tag_size(COSE_ALGORITHM_ES256), None);
        assert_eq!(hmac_to_hash_alg(COSE_ALGORITHM_HMAC512), Some(COSE_ALGORITHM_SHA_512));
        assert_eq!(hmac_to_hash_alg(-7), None);
        assert_eq!(sig_size(COSE_ALGORITHM_ES256), Some(64));
        assert_eq!(sig_size(COSE_ALGORITHM_HMAC256), None);
    }

    #[test]
    fn sha256_abc() {
        let mut hash = HashCtx::start(COSE_ALGORITHM_SHA_256).unwrap();
        hash.update(b"a");
        hash.update(b"bc");
        let mut buf = [0u8; 40];
        let n = hash.finish(&mut buf).unwrap();
        assert_eq!(
            &buf[..n],
            &hex!("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[test]
    fn hash_unsupported_and_short_buffer() {
        assert_eq!(HashCtx::start(0).err(), Some(Error::UnsupportedHash));
        let hash = HashCtx::start(COSE_ALGORITHM_SHA_512).unwrap();
        let mut buf = [0u8; 32];
        assert_eq!(
            hash.finish(&mut buf),
            Err(Error::SigBufferSize { have: 32, want: 64 })
        );
    }

    #[test]
    fn hmac_rfc4231_case_2() {
        let key = SymmetricKey::new(b"Jefe");
        let mut mac = HmacCtx::sign_setup(key, COSE_ALGORITHM_HMAC256).unwrap();
        mac.update(b"what do ya want ");
        mac.update(b"for nothing?");
        let mut buf = [0u8; HMAC_TAG_MAX_SIZE];
        let n = mac.sign_finish(&mut buf).unwrap();
        let expected = hex!("5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843");
        assert_eq!(&buf[..n], &expected);

        let mut mac = HmacCtx::verify_setup(key, COSE_ALGORITHM_HMAC256).unwrap();
        mac.update(b"what do ya want for nothing?");
        assert_eq!(mac.clone().verify_finish(&expected), Ok(()));
        assert_eq!(
            mac.clone().verify_finish(&expected[..31]),
            Err(Error::MacValidationFailed)
        );
        let mut flipped = expected;
        flipped[0] ^= 1;
        assert_eq!(mac.verify_finish(&flipped), Err(Error::MacValidationFailed));
    }

    #[test]
    fn hmac_setup_errors() {
        assert_eq!(
            HmacCtx::sign_setup(SymmetricKey::new(&[]), COSE_ALGORITHM_HMAC256).err(),
            Some(Error::InvalidKey)
        );
        assert_eq!(
            HmacCtx::sign_setup(SymmetricKey::new(b"k"), COSE_ALGORITHM_ES256).err(),
            Some(Error::UnsupportedSigningAlg)
        );
    }

    #[test]
    fn hmac_short_buffer() {
        let key = SymmetricKey::new(b"Jefe");
        let mac = HmacCtx::sign_setup(key, COSE_ALGORITHM_HMAC384).unwrap();
        let mut buf = [0u8; 47];
        assert_eq!(
            mac.sign_finish(&mut buf),
            Err(Error::SigBufferSize { have: 47, want: 48 })
        );
    }
}
