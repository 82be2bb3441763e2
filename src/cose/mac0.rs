//! `COSE_Mac0` creation and verification.
//!
//! ```text
//! COSE_Mac0 = [ protected: bstr .cbor header_map, unprotected: header_map,
//!               payload: bstr / nil, tag: bstr ]
//! ```
//!
//! Signing writes straight into the caller's buffer. The protected header
//! and the payload are read back from that buffer to compute the tag, so
//! the bytes authenticated are exactly the bytes sent.

use core::ops::Range;
use subtle::ConstantTimeEq;

use super::crypto::{tag_size, HmacCtx, SymmetricKey, HMAC_TAG_MAX_SIZE};
use super::headers::{decode_headers, encode_headers, HeaderParam, ParamList, Parameters};
use super::util::{process_tags, ToBeAuthenticated};
use super::{Error, Options, Result, CBOR_TAG_COSE_MAC0, MAX_TAGS_TO_RETURN};
use crate::cbor::{self, Bstr, CborError, Encoder, OutBuf, TagList};

/// Marks the end of [`Mac0SignCtx::encode_parameters`]: headers are out and
/// the payload byte string is open. Hand it back to
/// [`Mac0SignCtx::encode_tag`].
#[derive(Debug)]
#[must_use]
pub struct EncodedParameters {
    protected: Range<usize>,
}

enum Payload<'p> {
    /// Inside the message, at this range of the output.
    Embedded(Range<usize>),
    Detached(&'p [u8]),
}

/// Creates `COSE_Mac0` messages with one HMAC key.
pub struct Mac0SignCtx<'k> {
    options: Options,
    cose_alg_id: i32,
    key: Option<SymmetricKey<'k>>,
    kid: &'k [u8],
    content_type_uint: Option<u16>,
    content_type_tstr: Option<&'k str>,
}

impl<'k> Mac0SignCtx<'k> {
    /// Options accepted: [`Options::SHORT_CIRCUIT_TAG`] and
    /// [`Options::OMIT_CBOR_TAG`]. They and the algorithm are checked when
    /// signing, before anything is written.
    pub fn new(options: Options, cose_alg_id: i32) -> Self {
        Mac0SignCtx {
            options,
            cose_alg_id,
            key: None,
            kid: &[],
            content_type_uint: None,
            content_type_tstr: None,
        }
    }

    /// Sets the key, and the kid to put in the unprotected header. An empty
    /// kid is left out.
    pub fn set_signing_key(&mut self, key: SymmetricKey<'k>, kid: &'k [u8]) {
        self.key = Some(key);
        self.kid = kid;
    }

    /// Setting both content type forms fails the signing operation.
    pub fn set_content_type_uint(&mut self, content_type: u16) {
        self.content_type_uint = Some(content_type);
    }

    pub fn set_content_type_tstr(&mut self, content_type: &'k str) {
        self.content_type_tstr = Some(content_type);
    }

    fn short_circuit(&self) -> bool {
        self.options.contains(Options::SHORT_CIRCUIT_TAG)
    }

    /// Everything that can be rejected without writing.
    fn check(&self) -> Result<usize> {
        self.options.check(Options::MAC0_SIGN)?;
        let tag_len = tag_size(self.cose_alg_id).ok_or_else(|| {
            log::debug!("no MAC tag size for algorithm {}", self.cose_alg_id);
            Error::UnsupportedSigningAlg
        })?;
        if self.short_circuit() && !cfg!(feature = "short_circuit") {
            return Err(Error::ShortCircuitSigDisabled);
        }
        if self.content_type_uint.is_some() && self.content_type_tstr.is_some() {
            return Err(Error::DuplicateParameter);
        }
        if !self.short_circuit() && self.key.is_none() {
            return Err(Error::MissingKey);
        }
        Ok(tag_len)
    }

    /// Writes the optional CBOR tag, opens the array and writes both header
    /// maps. Returns where the protected header landed.
    fn encode_head(&self, enc: &mut Encoder<'_>) -> Result<Range<usize>> {
        self.check()?;
        if !self.options.contains(Options::OMIT_CBOR_TAG) {
            enc.add_tag(CBOR_TAG_COSE_MAC0);
        }
        enc.open_array();

        let mut params = ParamList::default();
        params.push(HeaderParam::alg_id(self.cose_alg_id))?;
        // A short-circuit tag is keyless, so no kid goes out with it
        if !self.short_circuit() && !self.kid.is_empty() {
            params.push(HeaderParam::kid(self.kid))?;
        }
        if let Some(content_type) = self.content_type_uint {
            params.push(HeaderParam::content_type_uint(content_type))?;
        }
        if let Some(content_type) = self.content_type_tstr {
            params.push(HeaderParam::content_type_tstr(content_type))?;
        }
        let protected = encode_headers(enc, &[params.as_slice()])?;
        log::trace!("MAC0 sign: parameters encoded");
        Ok(protected)
    }

    /// First half of the split signing API.
    ///
    /// Writes everything up to the payload and opens the payload byte
    /// string. Add the payload bytes with [`Encoder::add_encoded`], then call
    /// [`Mac0SignCtx::encode_tag`] and finish the encoder.
    pub fn encode_parameters(&self, enc: &mut Encoder<'_>) -> Result<EncodedParameters> {
        let protected = self.encode_head(enc)?;
        enc.open_bstr_wrap();
        Ok(EncodedParameters { protected })
    }

    /// Second half of the split signing API: closes the payload, computes
    /// the tag over it and closes the message array.
    pub fn encode_tag(
        &self,
        params: EncodedParameters,
        aad: &[u8],
        enc: &mut Encoder<'_>,
    ) -> Result<()> {
        let payload = enc.close_bstr_wrap();
        log::trace!("MAC0 sign: payload wrapped");
        self.append_tag(params.protected, aad, Payload::Embedded(payload), enc)
    }

    fn append_tag(
        &self,
        protected: Range<usize>,
        aad: &[u8],
        payload: Payload<'_>,
        enc: &mut Encoder<'_>,
    ) -> Result<()> {
        let tag_len = self.check()?;
        match enc.error_state() {
            Some(CborError::BufferTooSmall) => return Err(Error::TooSmall),
            Some(_) => return Err(Error::CborFormatting),
            None => {}
        }

        if enc.is_size_only() {
            enc.add_placeholder_bytes(tag_len);
        } else {
            let written = enc.written().ok_or(Error::CborFormatting)?;
            let protected = written.get(protected).ok_or(Error::CborFormatting)?;
            let payload = match payload {
                Payload::Embedded(range) => written.get(range).ok_or(Error::CborFormatting)?,
                Payload::Detached(bytes) => bytes,
            };
            let tbm = ToBeAuthenticated::mac0(protected, aad, payload);
            let mut tag = [0u8; HMAC_TAG_MAX_SIZE];
            let n = self.compute_tag(&tbm, &mut tag[..tag_len])?;
            enc.add_bytes(&tag[..n]);
        }
        log::trace!("MAC0 sign: tagged");
        enc.close_array();
        Ok(())
    }

    fn compute_tag(&self, tbm: &ToBeAuthenticated<'_>, buf: &mut [u8]) -> Result<usize> {
        if self.short_circuit() {
            return short_circuit_tag(self.cose_alg_id, tbm, buf);
        }
        let key = self.key.ok_or(Error::MissingKey)?;
        let mut mac = HmacCtx::sign_setup(key, self.cose_alg_id)?;
        tbm.feed(|chunk| mac.update(chunk));
        mac.sign_finish(buf)
    }

    /// Signs `payload` with no AAD. Returns the message length, which is all
    /// that is produced for [`OutBuf::SizeOnly`].
    pub fn sign(&self, payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        self.sign_aad(&[], payload, out)
    }

    /// Signs `payload`, also authenticating `aad`.
    pub fn sign_aad(&self, aad: &[u8], payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        let mut enc = Encoder::new(out);
        let params = self.encode_parameters(&mut enc)?;
        enc.add_encoded(payload);
        self.encode_tag(params, aad, &mut enc)?;
        finish(enc)
    }

    /// Signs `payload` without putting it in the message. The verifier must
    /// supply the same bytes.
    pub fn sign_detached(&self, aad: &[u8], payload: &[u8], out: OutBuf<'_>) -> Result<usize> {
        let mut enc = Encoder::new(out);
        let protected = self.encode_head(&mut enc)?;
        enc.add_null();
        self.append_tag(protected, aad, Payload::Detached(payload), &mut enc)?;
        finish(enc)
    }
}

fn finish(enc: Encoder<'_>) -> Result<usize> {
    enc.finish().map_err(|e| match e {
        CborError::BufferTooSmall => Error::TooSmall,
        _ => Error::CborNotWellFormed,
    })
}

#[cfg(feature = "short_circuit")]
fn short_circuit_tag(
    cose_alg_id: i32,
    tbm: &ToBeAuthenticated<'_>,
    buf: &mut [u8],
) -> Result<usize> {
    super::util::short_circuit_tag(cose_alg_id, tbm, buf)
}

#[cfg(not(feature = "short_circuit"))]
fn short_circuit_tag(_: i32, _: &ToBeAuthenticated<'_>, _: &mut [u8]) -> Result<usize> {
    Err(Error::ShortCircuitSigDisabled)
}

/// Whether a returned payload was authenticated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Authenticity {
    /// The tag was checked and is valid.
    Verified,
    /// Decoded with [`Options::DECODE_ONLY`]. Nothing was checked and the
    /// payload must not be trusted.
    Unchecked,
}

/// Output of a successful verification, borrowing from the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mac0Verification<'m> {
    /// The embedded payload, or the detached one that was supplied.
    pub payload: &'m [u8],
    pub parameters: Parameters<'m>,
    pub authenticity: Authenticity,
}

impl Mac0Verification<'_> {
    pub fn is_verified(&self) -> bool {
        self.authenticity == Authenticity::Verified
    }
}

type RawMac0<'m> = (Bstr<'m>, ParamList<'m>, Option<Bstr<'m>>, Bstr<'m>);

/// Verifies `COSE_Mac0` messages.
pub struct Mac0VerifyCtx<'k> {
    options: Options,
    key: Option<SymmetricKey<'k>>,
    tags: TagList<MAX_TAGS_TO_RETURN>,
}

impl<'k> Mac0VerifyCtx<'k> {
    /// Options accepted: [`Options::SHORT_CIRCUIT_TAG`],
    /// [`Options::REQUIRE_KID`], [`Options::TAG_REQUIRED`],
    /// [`Options::TAG_PROHIBITED`] and [`Options::DECODE_ONLY`].
    pub fn new(options: Options) -> Self {
        Mac0VerifyCtx {
            options,
            key: None,
            tags: TagList::default(),
        }
    }

    pub fn set_verify_key(&mut self, key: SymmetricKey<'k>) {
        self.key = Some(key);
    }

    /// The `n`th CBOR tag, outermost first, that the last verification found
    /// on the message and did not consume.
    pub fn nth_tag(&self, n: usize) -> Option<u64> {
        self.tags.get(n)
    }

    pub fn verify<'m>(&mut self, message: &'m [u8]) -> Result<Mac0Verification<'m>> {
        self.verify_inner(&[], None, message)
    }

    pub fn verify_aad<'m>(
        &mut self,
        aad: &[u8],
        message: &'m [u8],
    ) -> Result<Mac0Verification<'m>> {
        self.verify_inner(aad, None, message)
    }

    /// Verifies a message whose payload was sent separately.
    pub fn verify_detached<'m>(
        &mut self,
        aad: &[u8],
        detached_payload: &'m [u8],
        message: &'m [u8],
    ) -> Result<Mac0Verification<'m>> {
        self.verify_inner(aad, Some(detached_payload), message)
    }

    fn verify_inner<'m>(
        &mut self,
        aad: &[u8],
        detached: Option<&'m [u8]>,
        message: &'m [u8],
    ) -> Result<Mac0Verification<'m>> {
        self.tags = TagList::default();
        let options = self.options.check(Options::VERIFY)?;
        let short_circuit = options.contains(Options::SHORT_CIRCUIT_TAG);
        if short_circuit && !cfg!(feature = "short_circuit") {
            return Err(Error::ShortCircuitSigDisabled);
        }

        let (tags, body) = process_tags(message, CBOR_TAG_COSE_MAC0, options)?;
        self.tags = tags;
        let (Bstr(protected), unprotected, embedded, Bstr(tag)): RawMac0 = cbor::decode(body)?;
        let headers = decode_headers(protected, unprotected)?;
        let parameters = headers.parameters;
        if options.contains(Options::REQUIRE_KID) && parameters.kid.is_none() {
            return Err(Error::NoKid);
        }
        let payload: &'m [u8] = match (embedded, detached) {
            (Some(Bstr(embedded)), None) => embedded,
            (None, Some(detached)) => detached,
            (None, None) => return Err(Error::NoPayload),
            (Some(_), Some(_)) => return Err(Error::UnexpectedPayload),
        };

        if options.contains(Options::DECODE_ONLY) {
            log::debug!("MAC0 decoded without checking the tag");
            return Ok(Mac0Verification {
                payload,
                parameters,
                authenticity: Authenticity::Unchecked,
            });
        }

        let cose_alg_id = parameters.require_alg()?;
        let tag_len = tag_size(cose_alg_id).ok_or(Error::UnsupportedSigningAlg)?;
        if tag.len() != tag_len {
            log::debug!("MAC0 tag is {} bytes, expected {}", tag.len(), tag_len);
            return Err(Error::MacValidationFailed);
        }
        let tbm = ToBeAuthenticated::mac0(protected, aad, payload);
        if short_circuit {
            let mut expected = [0u8; HMAC_TAG_MAX_SIZE];
            let n = short_circuit_tag(cose_alg_id, &tbm, &mut expected)?;
            if !bool::from(expected[..n].ct_eq(tag)) {
                return Err(Error::MacValidationFailed);
            }
        } else {
            let key = self.key.ok_or(Error::MissingKey)?;
            let mut mac = HmacCtx::verify_setup(key, cose_alg_id)?;
            tbm.feed(|chunk| mac.update(chunk));
            mac.verify_finish(tag)?;
        }

        Ok(Mac0Verification {
            payload,
            parameters,
            authenticity: Authenticity::Verified,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_vectors::*;
    use super::super::{
        ContentType, COSE_ALGORITHM_ES256, COSE_ALGORITHM_HMAC256, COSE_ALGORITHM_HMAC384,
        COSE_ALGORITHM_HMAC512,
    };
    use super::*;
    use hex_literal::hex;

    fn signer(alg: i32, key: &[u8]) -> Mac0SignCtx<'_> {
        let mut ctx = Mac0SignCtx::new(Options::NONE, alg);
        ctx.set_signing_key(SymmetricKey::new(key), KID);
        ctx
    }

    fn verifier(key: &[u8]) -> Mac0VerifyCtx<'_> {
        let mut ctx = Mac0VerifyCtx::new(Options::NONE);
        ctx.set_verify_key(SymmetricKey::new(key));
        ctx
    }

    #[test]
    fn sign_hmac256() {
        let mut buf = [0u8; 128];
        let len = signer(COSE_ALGORITHM_HMAC256, &HMAC_KEY_256)
            .sign(PAYLOAD, OutBuf::Write(&mut buf))
            .unwrap();
        assert_eq!(&buf[..len], &MAC0_HMAC256[..]);
    }

    #[test]
    fn verify_hmac256() {
        let mut ctx = verifier(&HMAC_KEY_256);
        let result = ctx.verify(&MAC0_HMAC256).unwrap();
        assert_eq!(result.payload, PAYLOAD);
        assert_eq!(result.parameters.kid, Some(KID));
        assert_eq!(result.parameters.cose_algorithm_id, Some(COSE_ALGORITHM_HMAC256));
        assert!(result.is_verified());
        assert_eq!(ctx.nth_tag(0), None);

        let mut wrong_key = HMAC_KEY_256;
        wrong_key[31] ^= 0x80;
        assert_eq!(
            verifier(&wrong_key).verify(&MAC0_HMAC256).err(),
            Some(Error::MacValidationFailed)
        );
        // The AAD is authenticated too
        assert_eq!(
            verifier(&HMAC_KEY_256).verify_aad(AAD, &MAC0_HMAC256).err(),
            Some(Error::MacValidationFailed)
        );
    }

    #[test]
    fn detached_with_aad() {
        let mut buf = [0u8; 128];
        let len = signer(COSE_ALGORITHM_HMAC512, &HMAC_KEY_512)
            .sign_detached(AAD, PAYLOAD, OutBuf::Write(&mut buf))
            .unwrap();
        assert_eq!(&buf[..len], &MAC0_HMAC512_AAD_DETACHED[..]);

        let mut ctx = verifier(&HMAC_KEY_512);
        let msg = &MAC0_HMAC512_AAD_DETACHED;
        let result = ctx.verify_detached(AAD, PAYLOAD, msg).unwrap();
        assert_eq!(result.payload, PAYLOAD);
        assert_eq!(
            ctx.verify_detached(AAD, b"This is the content!", msg).err(),
            Some(Error::MacValidationFailed)
        );
        assert_eq!(ctx.verify_aad(AAD, msg).err(), Some(Error::NoPayload));
        assert_eq!(
            verifier(&HMAC_KEY_256)
                .verify_detached(&[], PAYLOAD, &MAC0_HMAC256)
                .err(),
            Some(Error::UnexpectedPayload)
        );
    }

    #[test]
    fn untagged_with_content_type() {
        let mut ctx = Mac0SignCtx::new(Options::OMIT_CBOR_TAG, COSE_ALGORITHM_HMAC384);
        ctx.set_signing_key(SymmetricKey::new(&HMAC_KEY_384), &[]);
        ctx.set_content_type_uint(60);
        let mut buf = [0u8; 128];
        let len = ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)).unwrap();
        assert_eq!(&buf[..len], &MAC0_HMAC384_CT[..]);

        let mut v = Mac0VerifyCtx::new(Options::TAG_PROHIBITED);
        v.set_verify_key(SymmetricKey::new(&HMAC_KEY_384));
        let result = v.verify(&MAC0_HMAC384_CT).unwrap();
        assert_eq!(result.parameters.content_type, Some(ContentType::Uint(60)));
        assert_eq!(result.parameters.kid, None);

        let mut v = Mac0VerifyCtx::new(Options::TAG_REQUIRED);
        v.set_verify_key(SymmetricKey::new(&HMAC_KEY_384));
        assert_eq!(v.verify(&MAC0_HMAC384_CT).err(), Some(Error::IncorrectlyTagged));

        let mut v = Mac0VerifyCtx::new(Options::REQUIRE_KID);
        v.set_verify_key(SymmetricKey::new(&HMAC_KEY_384));
        assert_eq!(v.verify(&MAC0_HMAC384_CT).err(), Some(Error::NoKid));
    }

    #[test]
    fn round_trips() {
        let cases: [(i32, &[u8]); 3] = [
            (COSE_ALGORITHM_HMAC256, &HMAC_KEY_256),
            (COSE_ALGORITHM_HMAC384, &HMAC_KEY_384),
            (COSE_ALGORITHM_HMAC512, &HMAC_KEY_512),
        ];
        let long_payload = [0x5A; 300];
        for (alg, key) in cases {
            for payload in [&[][..], PAYLOAD, &long_payload[..]] {
                for aad in [&[][..], AAD] {
                    let mut ctx = signer(alg, key);
                    ctx.set_content_type_tstr("application/cbor");
                    let mut buf = [0u8; 512];
                    let len = ctx.sign_aad(aad, payload, OutBuf::Write(&mut buf)).unwrap();

                    let mut v = verifier(key);
                    let result = v.verify_aad(aad, &buf[..len]).unwrap();
                    assert_eq!(result.payload, payload);
                    assert_eq!(
                        result.parameters.content_type,
                        Some(ContentType::Text("application/cbor"))
                    );
                    assert_eq!(result.authenticity, Authenticity::Verified);
                }
            }
        }
    }

    #[test]
    fn tamper_detection() {
        let mut v = verifier(&HMAC_KEY_256);
        // Protected header 2..6, then payload and tag 19..74 with their heads.
        // Only the outer tag and the kid map 6..19 are not authenticated.
        for i in (2..6).chain(19..74) {
            for bit in 0..8 {
                let mut msg = MAC0_HMAC256;
                msg[i] ^= 1 << bit;
                let result = v.verify(&msg);
                assert!(result.is_err(), "byte {} bit {} accepted", i, bit);
                if (20..40).contains(&i) || i >= 42 {
                    assert_eq!(result.err(), Some(Error::MacValidationFailed));
                }
            }
        }
        // alg 5 to alg 7 keeps the message well formed
        let mut msg = MAC0_HMAC256;
        msg[5] ^= 0x02;
        assert_eq!(v.verify(&msg).err(), Some(Error::MacValidationFailed));
    }

    #[test]
    fn text_strings_are_not_byte_strings() {
        let mut v = verifier(&HMAC_KEY_256);
        // protected, payload and tag heads turned into text string heads
        for (i, head) in [(2, 0x63), (19, 0x74), (40, 0x78)] {
            let mut msg = MAC0_HMAC256;
            msg[i] = head;
            assert_eq!(v.verify(&msg).err(), Some(Error::CborNotWellFormed));
        }
        let mut msg = MAC0_HMAC256;
        msg[19] = 0x74;
        let mut v = Mac0VerifyCtx::new(Options::DECODE_ONLY);
        assert_eq!(v.verify(&msg).err(), Some(Error::CborNotWellFormed));
    }

    #[test]
    fn size_only_and_retry() {
        let ctx = signer(COSE_ALGORITHM_HMAC256, &HMAC_KEY_256);
        let size = ctx.sign(PAYLOAD, OutBuf::SizeOnly).unwrap();
        assert_eq!(size, MAC0_HMAC256.len());
        assert_eq!(
            ctx.sign_detached(AAD, PAYLOAD, OutBuf::SizeOnly).unwrap(),
            MAC0_HMAC256.len() - PAYLOAD.len()
        );

        let mut small = [0u8; 73];
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut small)),
            Err(Error::TooSmall)
        );
        // Headers alone do not fit either
        let mut tiny = [0u8; 4];
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut tiny)),
            Err(Error::TooSmall)
        );

        let mut exact = [0u8; 74];
        assert_eq!(ctx.sign(PAYLOAD, OutBuf::Write(&mut exact)), Ok(size));
        assert_eq!(exact, MAC0_HMAC256);
    }

    #[test]
    fn split_api_matches_one_shot() {
        let ctx = signer(COSE_ALGORITHM_HMAC256, &HMAC_KEY_256);
        let mut buf = [0u8; 128];
        let mut enc = Encoder::new(OutBuf::Write(&mut buf));
        let params = ctx.encode_parameters(&mut enc).unwrap();
        enc.add_encoded(&PAYLOAD[..7]);
        enc.add_encoded(&PAYLOAD[7..]);
        ctx.encode_tag(params, &[], &mut enc).unwrap();
        let len = enc.finish().unwrap();
        assert_eq!(&buf[..len], &MAC0_HMAC256[..]);
    }

    #[test]
    fn rejected_before_writing() {
        let mut buf = [0u8; 128];

        let mut ctx = signer(COSE_ALGORITHM_HMAC256, &HMAC_KEY_256);
        ctx.set_content_type_uint(0);
        ctx.set_content_type_tstr("text/plain");
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)),
            Err(Error::DuplicateParameter)
        );

        let ctx = signer(COSE_ALGORITHM_ES256, &HMAC_KEY_256);
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)),
            Err(Error::UnsupportedSigningAlg)
        );

        let ctx = Mac0SignCtx::new(Options::NONE, COSE_ALGORITHM_HMAC256);
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)),
            Err(Error::MissingKey)
        );

        let ctx = Mac0SignCtx::new(Options::DECODE_ONLY, COSE_ALGORITHM_HMAC256);
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)),
            Err(Error::InvalidOptions(0x20))
        );

        assert!(buf.iter().all(|b| *b == 0));
    }

    #[test]
    fn verify_rejects_bad_structure() {
        let mut v = verifier(&HMAC_KEY_256);
        assert_eq!(
            v.verify(&MAC0_HMAC256[..73]).err(),
            Some(Error::CborNotWellFormed)
        );
        // Three items
        assert_eq!(
            v.verify(&[0x83, 0x41, 0xA0, 0xA0, 0xF6]).err(),
            Some(Error::CborNotWellFormed)
        );
        // No alg
        assert_eq!(
            v.verify(&[0x84, 0x41, 0xA0, 0xA0, 0x40, 0x40]).err(),
            Some(Error::NoAlgId)
        );
        // alg ES256 is not a MAC
        assert_eq!(
            v.verify(&hex!("84 43 A1 0126 A0 40 40")).err(),
            Some(Error::UnsupportedSigningAlg)
        );
        // crit [99]
        assert_eq!(
            v.verify(&hex!("84 47 A2 0105 02 81 1863 A0 40 40")).err(),
            Some(Error::UnknownCriticalParameter)
        );
        let mut v = Mac0VerifyCtx::new(Options::NONE);
        assert_eq!(v.verify(&MAC0_HMAC256).err(), Some(Error::MissingKey));
        let mut v = Mac0VerifyCtx::new(Options::OMIT_CBOR_TAG);
        assert_eq!(
            v.verify(&MAC0_HMAC256).err(),
            Some(Error::InvalidOptions(0x02))
        );
    }

    #[test]
    fn decode_only() {
        let mut msg = MAC0_HMAC256;
        msg[73] ^= 1;
        let mut v = Mac0VerifyCtx::new(Options::DECODE_ONLY);
        let result = v.verify(&msg).unwrap();
        assert_eq!(result.payload, PAYLOAD);
        assert_eq!(result.authenticity, Authenticity::Unchecked);
        assert!(!result.is_verified());
    }

    #[test]
    fn unconsumed_tags() {
        let mut msg = [0u8; 76];
        msg[..2].copy_from_slice(&[0xD8, 0x3D]);
        msg[2..].copy_from_slice(&MAC0_HMAC256);
        let mut v = verifier(&HMAC_KEY_256);
        assert!(v.verify(&msg).unwrap().is_verified());
        assert_eq!(v.nth_tag(0), Some(61));
        assert_eq!(v.nth_tag(1), None);

        v.verify(&MAC0_HMAC256).unwrap();
        assert_eq!(v.nth_tag(0), None);
    }

    #[cfg(feature = "short_circuit")]
    #[test]
    fn short_circuit() {
        let mut ctx = Mac0SignCtx::new(Options::SHORT_CIRCUIT_TAG, COSE_ALGORITHM_HMAC256);
        // Neither kid nor key are used
        ctx.set_signing_key(SymmetricKey::new(&[]), KID);
        let mut buf = [0u8; 128];
        let len = ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)).unwrap();
        let msg = &buf[..len];
        assert_eq!(&msg[..6], &MAC0_HMAC256[..6]);
        assert_eq!(msg[6], 0xA0);
        assert_eq!(&msg[len - 32..], &SHORT_CIRCUIT_TAG_256[..]);

        let mut v = Mac0VerifyCtx::new(Options::SHORT_CIRCUIT_TAG);
        assert!(v.verify(msg).unwrap().is_verified());

        // Without the option it is checked as a real MAC
        assert_eq!(
            verifier(&HMAC_KEY_256).verify(msg).err(),
            Some(Error::MacValidationFailed)
        );
        // And a real MAC is not a short-circuit tag
        assert_eq!(v.verify(&MAC0_HMAC256).err(), Some(Error::MacValidationFailed));
    }

    #[cfg(not(feature = "short_circuit"))]
    #[test]
    fn short_circuit_disabled() {
        let ctx = Mac0SignCtx::new(Options::SHORT_CIRCUIT_TAG, COSE_ALGORITHM_HMAC256);
        let mut buf = [0u8; 128];
        assert_eq!(
            ctx.sign(PAYLOAD, OutBuf::Write(&mut buf)),
            Err(Error::ShortCircuitSigDisabled)
        );
        assert!(buf.iter().all(|b| *b == 0));

        let mut v = Mac0VerifyCtx::new(Options::SHORT_CIRCUIT_TAG);
        assert_eq!(
            v.verify(&MAC0_HMAC256).err(),
            Some(Error::ShortCircuitSigDisabled)
        );
    }
}
