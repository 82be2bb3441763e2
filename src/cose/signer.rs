//! Signers and verifiers for `COSE_Signature`.
//!
//! A [`Signer`] appends one complete `COSE_Signature` to an encoder, which
//! lets a `COSE_Sign` carry signatures from different algorithm families
//! without the message code knowing any of them. A [`Verifier`] checks one
//! decoded signature.

use digest::Digest;
use p256::ecdsa::{
    signature::{DigestSigner, DigestVerifier},
    Signature, SigningKey, VerifyingKey,
};
use sha2::Sha256;

use super::crypto::{sig_size, COSE_ALGORITHM_ES256, SIGNATURE_MAX_SIZE};
use super::headers::{decode_headers, encode_headers, DecodedHeaders, HeaderParam, ParamList};
use super::util::ToBeAuthenticated;
use super::{Error, Result};
use crate::cbor::{Bstr, Encoder};

/// Produces one `COSE_Signature`.
pub trait Signer {
    /// COSE algorithm ID of the signatures this signer makes.
    fn algorithm(&self) -> i32;

    /// Appends `[protected, unprotected, signature]` to `enc`.
    ///
    /// When `enc` is only counting, a placeholder of the signature's exact
    /// size is appended instead of signing.
    fn sign(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        enc: &mut Encoder<'_>,
    ) -> Result<()>;
}

/// Checks one `COSE_Signature`.
pub trait Verifier {
    fn verify(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        signature: &CoseSignature<'_>,
    ) -> Result<()>;
}

/// A decoded `COSE_Signature`, borrowing from the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CoseSignature<'a> {
    /// The signature's protected header bytes, as received.
    pub protected: &'a [u8],
    pub headers: DecodedHeaders<'a>,
    pub signature: &'a [u8],
}

impl<'a> CoseSignature<'a> {
    pub(crate) fn from_parts(
        Bstr(protected): Bstr<'a>,
        unprotected: ParamList<'a>,
        Bstr(signature): Bstr<'a>,
    ) -> Result<Self> {
        Ok(CoseSignature {
            protected,
            headers: decode_headers(protected, unprotected)?,
            signature,
        })
    }

    pub fn kid(&self) -> Option<&'a [u8]> {
        self.headers.parameters.kid
    }

    fn to_be_signed(
        &self,
        body_protected: &'a [u8],
        payload: &'a [u8],
        aad: &'a [u8],
    ) -> ToBeAuthenticated<'a> {
        ToBeAuthenticated::signature(body_protected, self.protected, aad, payload)
    }

    /// Checks the algorithm and the signature length before any crypto runs.
    fn check_shape(&self, cose_alg_id: i32) -> Result<usize> {
        if self.headers.parameters.require_alg()? != cose_alg_id {
            return Err(Error::UnsupportedSigningAlg);
        }
        let want = sig_size(cose_alg_id).ok_or(Error::UnsupportedSigningAlg)?;
        if self.signature.len() != want {
            return Err(Error::SigBufferSize {
                have: self.signature.len(),
                want,
            });
        }
        Ok(want)
    }
}

/// Writes a `COSE_Signature` around the bytes `sign` produces.
fn append_signature(
    enc: &mut Encoder<'_>,
    cose_alg_id: i32,
    kid: &[u8],
    body_protected: &[u8],
    payload: &[u8],
    aad: &[u8],
    sign: impl FnOnce(&ToBeAuthenticated<'_>, &mut [u8]) -> Result<()>,
) -> Result<()> {
    let sig_len = sig_size(cose_alg_id).ok_or(Error::UnsupportedSigningAlg)?;
    let alg = [HeaderParam::alg_id(cose_alg_id)];
    let kid_param = [HeaderParam::kid(kid)];
    let kid_list: &[HeaderParam] = if kid.is_empty() { &[] } else { &kid_param };

    enc.open_array();
    let protected = encode_headers(enc, &[&alg, kid_list])?;
    match enc.written().map(|w| &w[protected]) {
        Some(sign_protected) => {
            let mut sig = [0u8; SIGNATURE_MAX_SIZE];
            let tbs = ToBeAuthenticated::signature(body_protected, sign_protected, aad, payload);
            sign(&tbs, &mut sig[..sig_len])?;
            enc.add_bytes(&sig[..sig_len]);
        }
        None => enc.add_placeholder_bytes(sig_len),
    }
    enc.close_array();
    Ok(())
}

fn sha256_of(tbs: &ToBeAuthenticated<'_>) -> Sha256 {
    let mut digest = Sha256::new();
    tbs.feed(|chunk| digest.update(chunk));
    digest
}

/// ES256 signer. Signatures are deterministic (RFC 6979).
pub struct EcdsaSigner<'k> {
    key: &'k SigningKey,
    kid: &'k [u8],
}

impl<'k> EcdsaSigner<'k> {
    /// An empty `kid` leaves the kid out of the signature's headers.
    pub fn new(key: &'k SigningKey, kid: &'k [u8]) -> Self {
        EcdsaSigner { key, kid }
    }
}

impl Signer for EcdsaSigner<'_> {
    fn algorithm(&self) -> i32 {
        COSE_ALGORITHM_ES256
    }

    fn sign(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        enc: &mut Encoder<'_>,
    ) -> Result<()> {
        append_signature(
            enc,
            COSE_ALGORITHM_ES256,
            self.kid,
            body_protected,
            payload,
            aad,
            |tbs, out| {
                let sig: Signature = self.key.try_sign_digest(sha256_of(tbs)).map_err(|e| {
                    log::debug!("ECDSA signing failed: {}", e);
                    Error::CryptoFailure
                })?;
                out.copy_from_slice(&sig.to_bytes());
                Ok(())
            },
        )
    }
}

/// ES256 verifier.
pub struct EcdsaVerifier<'k> {
    key: &'k VerifyingKey,
}

impl<'k> EcdsaVerifier<'k> {
    pub fn new(key: &'k VerifyingKey) -> Self {
        EcdsaVerifier { key }
    }
}

impl Verifier for EcdsaVerifier<'_> {
    fn verify(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        signature: &CoseSignature<'_>,
    ) -> Result<()> {
        signature.check_shape(COSE_ALGORITHM_ES256)?;
        let sig = Signature::from_slice(signature.signature).map_err(|_| Error::SigVerify)?;
        let tbs = signature.to_be_signed(body_protected, payload, aad);
        self.key.verify_digest(sha256_of(&tbs), &sig).map_err(|_| {
            log::debug!("ECDSA signature did not verify");
            Error::SigVerify
        })
    }
}

/// Keyless ES256-sized stand-in signer, for testing without key material.
#[cfg(feature = "short_circuit")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ShortCircuitSigner;

#[cfg(feature = "short_circuit")]
impl Signer for ShortCircuitSigner {
    fn algorithm(&self) -> i32 {
        COSE_ALGORITHM_ES256
    }

    fn sign(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        enc: &mut Encoder<'_>,
    ) -> Result<()> {
        append_signature(
            enc,
            COSE_ALGORITHM_ES256,
            &[],
            body_protected,
            payload,
            aad,
            |tbs, out| super::util::short_circuit_sig(tbs, out),
        )
    }
}

/// Accepts the signatures [`ShortCircuitSigner`] makes.
#[cfg(feature = "short_circuit")]
#[derive(Clone, Copy, Debug, Default)]
pub struct ShortCircuitVerifier;

#[cfg(feature = "short_circuit")]
impl Verifier for ShortCircuitVerifier {
    fn verify(
        &self,
        body_protected: &[u8],
        payload: &[u8],
        aad: &[u8],
        signature: &CoseSignature<'_>,
    ) -> Result<()> {
        use subtle::ConstantTimeEq;

        let len = signature.check_shape(COSE_ALGORITHM_ES256)?;
        let mut expected = [0u8; SIGNATURE_MAX_SIZE];
        let tbs = signature.to_be_signed(body_protected, payload, aad);
        super::util::short_circuit_sig(&tbs, &mut expected[..len])?;
        if bool::from(expected[..len].ct_eq(signature.signature)) {
            Ok(())
        } else {
            Err(Error::SigVerify)
        }
    }
}
