//! `COSE_Sign` with one `COSE_Signature` per signer.
//!
//! The body headers are left empty; algorithm and kid live in each
//! signature's own headers, so signers are independent of each other and of
//! their position in the list.

use core::fmt;
use serde::de::{Deserialize, Deserializer, IgnoredAny, SeqAccess, Visitor};

use super::headers::{decode_headers, ParamList, Parameters};
use super::mac0::Authenticity;
use super::signer::{CoseSignature, Signer, Verifier};
use super::util::process_tags;
use super::{Error, Options, Result, CBOR_TAG_COSE_SIGN, MAX_SIGNATURES, MAX_TAGS_TO_RETURN};
use crate::cbor::{self, Bstr, CborError, Encoder, OutBuf, TagList};

/// Body protected header: an empty map.
const BODY_PROTECTED: &[u8] = &[0xA0];

/// Creates `COSE_Sign` messages.
pub struct SignCtx<'s> {
    options: Options,
    signers: &'s [&'s dyn Signer],
}

impl<'s> SignCtx<'s> {
    /// `signers` each add one signature, in order. The only option accepted
    /// is [`Options::OMIT_CBOR_TAG`].
    pub fn new(options: Options, signers: &'s [&'s dyn Signer]) -> Self {
        SignCtx { options, signers }
    }

    pub fn sign(&self, payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        self.sign_inner(&[], payload, false, out)
    }

    pub fn sign_aad(&self, aad: &[u8], payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        self.sign_inner(aad, payload, false, out)
    }

    pub fn sign_detached(&self, aad: &[u8], payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        self.sign_inner(aad, payload, true, out)
    }

    fn sign_inner(
        &self,
        aad: &[u8],
        payload: &[u8],
        detached: bool,
        out: OutBuf<'_>,
    ) -> Result<usize> {
        self.options.check(Options::SIGN)?;
        if self.signers.is_empty() {
            return Err(Error::NoSigners);
        }
        if self.signers.len() > MAX_SIGNATURES {
            return Err(Error::TooManySignatures);
        }

        let mut enc = Encoder::new(out);
        if !self.options.contains(Options::OMIT_CBOR_TAG) {
            enc.add_tag(CBOR_TAG_COSE_SIGN);
        }
        enc.open_array();
        enc.add_bytes(BODY_PROTECTED);
        enc.open_map();
        enc.close_map();
        if detached {
            enc.add_null();
        } else {
            enc.add_bytes(payload);
        }

        enc.open_array();
        for (i, signer) in self.signers.iter().enumerate() {
            log::trace!("COSE_Sign: signature {} alg {}", i, signer.algorithm());
            signer.sign(BODY_PROTECTED, payload, aad, &mut enc)?;
        }
        enc.close_array();
        enc.close_array();

        enc.finish().map_err(|e| match e {
            CborError::BufferTooSmall => Error::TooSmall,
            _ => Error::CborNotWellFormed,
        })
    }
}

type RawSignature<'m> = (Bstr<'m>, ParamList<'m>, Bstr<'m>);

/// The signatures array, kept undecoded beyond CBOR until verification.
struct RawSignatures<'m> {
    entries: [Option<RawSignature<'m>>; MAX_SIGNATURES],
    len: usize,
    overflow: bool,
}

impl<'de> Deserialize<'de> for RawSignatures<'de> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> core::result::Result<Self, D::Error> {
        struct SignaturesVisitor;

        impl<'de> Visitor<'de> for SignaturesVisitor {
            type Value = RawSignatures<'de>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "an array of COSE_Signature")
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> core::result::Result<Self::Value, A::Error> {
                let mut sigs = RawSignatures {
                    entries: [None; MAX_SIGNATURES],
                    len: 0,
                    overflow: false,
                };
                while sigs.len < MAX_SIGNATURES {
                    match seq.next_element::<RawSignature>()? {
                        Some(sig) => {
                            sigs.entries[sigs.len] = Some(sig);
                            sigs.len += 1;
                        }
                        None => return Ok(sigs),
                    }
                }
                while seq.next_element::<IgnoredAny>()?.is_some() {
                    sigs.overflow = true;
                }
                Ok(sigs)
            }
        }

        deserializer.deserialize_seq(SignaturesVisitor)
    }
}

type RawSign<'m> = (Bstr<'m>, ParamList<'m>, Option<Bstr<'m>>, RawSignatures<'m>);

/// Output of a successful `COSE_Sign` verification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignVerification<'m> {
    pub payload: &'m [u8],
    /// Parameters of the body headers.
    pub parameters: Parameters<'m>,
    /// Number of signatures on the message.
    pub signatures: usize,
    pub authenticity: Authenticity,
}

/// Verifies `COSE_Sign` messages.
///
/// Each signature is checked by the verifier at the same position, and all
/// of them must pass.
pub struct SignVerifyCtx<'v> {
    options: Options,
    verifiers: &'v [&'v dyn Verifier],
    tags: TagList<MAX_TAGS_TO_RETURN>,
}

impl<'v> SignVerifyCtx<'v> {
    /// Options accepted: [`Options::REQUIRE_KID`] (on every signature),
    /// [`Options::TAG_REQUIRED`], [`Options::TAG_PROHIBITED`] and
    /// [`Options::DECODE_ONLY`].
    pub fn new(options: Options, verifiers: &'v [&'v dyn Verifier]) -> Self {
        SignVerifyCtx {
            options,
            verifiers,
            tags: TagList::default(),
        }
    }

    pub fn nth_tag(&self, n: usize) -> Option<u64> {
        self.tags.get(n)
    }

    pub fn verify<'m>(&mut self, message: &'m [u8]) -> Result<SignVerification<'m>> {
        self.verify_inner(&[], None, message)
    }

    pub fn verify_aad<'m>(
        &mut self,
        aad: &[u8],
        message: &'m [u8],
    ) -> Result<SignVerification<'m>> {
        self.verify_inner(aad, None, message)
    }

    pub fn verify_detached<'m>(
        &mut self,
        aad: &[u8],
        detached_payload: &'m [u8],
        message: &'m [u8],
    ) -> Result<SignVerification<'m>> {
        self.verify_inner(aad, Some(detached_payload), message)
    }

    fn verify_inner<'m>(
        &mut self,
        aad: &[u8],
        detached: Option<&'m [u8]>,
        message: &'m [u8],
    ) -> Result<SignVerification<'m>> {
        self.tags = TagList::default();
        let options = self.options.check(Options::SIGN_VERIFY)?;
        let (tags, body) = process_tags(message, CBOR_TAG_COSE_SIGN, options)?;
        self.tags = tags;

        let (Bstr(protected), unprotected, embedded, sigs): RawSign = cbor::decode(body)?;
        let headers = decode_headers(protected, unprotected)?;
        if sigs.overflow {
            return Err(Error::TooManySignatures);
        }
        let payload: &'m [u8] = match (embedded, detached) {
            (Some(Bstr(embedded)), None) => embedded,
            (None, Some(detached)) => detached,
            (None, None) => return Err(Error::NoPayload),
            (Some(_), Some(_)) => return Err(Error::UnexpectedPayload),
        };
        let mut verification = SignVerification {
            payload,
            parameters: headers.parameters,
            signatures: sigs.len,
            authenticity: Authenticity::Unchecked,
        };
        if options.contains(Options::DECODE_ONLY) {
            log::debug!("COSE_Sign decoded without checking signatures");
            return Ok(verification);
        }

        if self.verifiers.is_empty() {
            return Err(Error::NoSigners);
        }
        if sigs.len != self.verifiers.len() {
            return Err(Error::SignatureCount {
                have: sigs.len,
                want: self.verifiers.len(),
            });
        }
        for (raw, verifier) in sigs.entries.iter().flatten().zip(self.verifiers) {
            let (sign_protected, sign_unprotected, signature) = *raw;
            let sig = CoseSignature::from_parts(sign_protected, sign_unprotected, signature)?;
            if options.contains(Options::REQUIRE_KID) && sig.kid().is_none() {
                return Err(Error::NoKid);
            }
            verifier.verify(protected, payload, aad, &sig)?;
        }

        verification.authenticity = Authenticity::Verified;
        Ok(verification)
    }
}
