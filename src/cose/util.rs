use super::{Error, Options, Result, MAX_TAGS_TO_RETURN};
use crate::cbor::{self, head, Encoder, OutBuf, TagList, MAJOR_ARRAY, MAJOR_BYTES, MAJOR_TEXT};
#[cfg(feature = "short_circuit")]
use super::crypto::{hmac_to_hash_alg, HashCtx, COSE_ALGORITHM_SHA_256};

const CONTEXT_MAC0: &str = "MAC0";
const CONTEXT_SIGNATURE: &str = "Signature";

/// The structure the MAC or signature is computed over.
///
/// The engines never materialize it in one piece: [`ToBeAuthenticated::feed`]
/// hands it to a hash or MAC chunk by chunk, with the payload passed straight
/// from wherever it already lives.
///
/// [`first_part`](Self::first_part) and [`len`](Self::len) are for a
/// [`Signer`](super::Signer) whose primitive wants the whole structure in
/// one buffer, so it can size that buffer up front and then write the
/// payload after the first part.
#[derive(Clone, Copy, Debug)]
pub struct ToBeAuthenticated<'a> {
    context: &'static str,
    body_protected: &'a [u8],
    sign_protected: Option<&'a [u8]>,
    aad: &'a [u8],
    payload: &'a [u8],
}

impl<'a> ToBeAuthenticated<'a> {
    /// `MAC_structure` for a `COSE_Mac0`.
    pub fn mac0(protected: &'a [u8], aad: &'a [u8], payload: &'a [u8]) -> Self {
        ToBeAuthenticated {
            context: CONTEXT_MAC0,
            body_protected: protected,
            sign_protected: None,
            aad,
            payload,
        }
    }

    /// `Sig_structure` for one `COSE_Signature` of a `COSE_Sign`.
    pub fn signature(
        body_protected: &'a [u8],
        sign_protected: &'a [u8],
        aad: &'a [u8],
        payload: &'a [u8],
    ) -> Self {
        ToBeAuthenticated {
            context: CONTEXT_SIGNATURE,
            body_protected,
            sign_protected: Some(sign_protected),
            aad,
            payload,
        }
    }

    fn items(&self) -> u64 {
        if self.sign_protected.is_some() {
            5
        } else {
            4
        }
    }

    /// Encodes everything but the payload content, ending with the payload's
    /// byte-string head. Returns the length, which is all that is produced
    /// for [`OutBuf::SizeOnly`].
    pub fn first_part(&self, out: OutBuf<'_>) -> Result<usize> {
        let mut enc = Encoder::new(out);
        enc.open_array();
        enc.add_text(self.context);
        enc.add_bytes(self.body_protected);
        if let Some(sign_protected) = self.sign_protected {
            enc.add_bytes(sign_protected);
        }
        enc.add_bytes(self.aad);
        enc.add_bytes_len_only(self.payload.len());
        enc.close_array();
        Ok(enc.finish()?)
    }

    /// Total encoded length, payload included, for sizing a buffer that
    /// holds the whole structure.
    pub fn len(&self) -> Result<usize> {
        Ok(self.first_part(OutBuf::SizeOnly)? + self.payload.len())
    }

    /// Passes the encoded structure to `update`, in order, without copying
    /// any of its parts.
    pub fn feed(&self, mut update: impl FnMut(&[u8])) {
        let (h, n) = head(MAJOR_ARRAY, self.items());
        update(&h[..n]);
        let mut item = |major: u8, content: &[u8]| {
            let (h, n) = head(major, content.len() as u64);
            update(&h[..n]);
            update(content);
        };
        item(MAJOR_TEXT, self.context.as_bytes());
        item(MAJOR_BYTES, self.body_protected);
        if let Some(sign_protected) = self.sign_protected {
            item(MAJOR_BYTES, sign_protected);
        }
        item(MAJOR_BYTES, self.aad);
        item(MAJOR_BYTES, self.payload);
    }
}

/// Computes the keyless stand-in for a MAC: the hash underlying the MAC
/// algorithm, taken over the same structure, so it is as long as the real
/// tag.
#[cfg(feature = "short_circuit")]
pub(crate) fn short_circuit_tag(
    cose_alg_id: i32,
    tbm: &ToBeAuthenticated<'_>,
    buf: &mut [u8],
) -> Result<usize> {
    let hash_alg = hmac_to_hash_alg(cose_alg_id).ok_or(Error::UnsupportedSigningAlg)?;
    let mut hash = HashCtx::start(hash_alg)?;
    tbm.feed(|chunk| hash.update(chunk));
    hash.finish(buf)
}

/// Computes the keyless stand-in for a signature of `buf.len()` bytes: the
/// SHA-256 of the structure, repeated.
#[cfg(feature = "short_circuit")]
pub(crate) fn short_circuit_sig(tbs: &ToBeAuthenticated<'_>, buf: &mut [u8]) -> Result<()> {
    let mut hash = HashCtx::start(COSE_ALGORITHM_SHA_256)?;
    tbs.feed(|chunk| hash.update(chunk));
    let mut digest = [0u8; 32];
    let n = hash.finish(&mut digest)?;
    for chunk in buf.chunks_mut(n) {
        chunk.copy_from_slice(&digest[..chunk.len()]);
    }
    Ok(())
}

/// Splits the CBOR tags off the front of a message.
///
/// The innermost tag is consumed if it is `cose_tag`; the tag rules in
/// `options` are enforced against it. Any other tags are handed back, at
/// most [`MAX_TAGS_TO_RETURN`] of them.
pub(crate) fn process_tags(
    message: &[u8],
    cose_tag: u64,
    options: Options,
) -> Result<(TagList<MAX_TAGS_TO_RETURN>, &[u8])> {
    let (tags, rest) = cbor::split_tags::<{ MAX_TAGS_TO_RETURN + 1 }>(message)?;
    let tagged = tags.last() == Some(cose_tag);
    if (options.contains(Options::TAG_REQUIRED) && !tagged)
        || (options.contains(Options::TAG_PROHIBITED) && tagged)
    {
        log::debug!("message tagging does not match the required rule");
        return Err(Error::IncorrectlyTagged);
    }
    let others = if tagged {
        &tags.as_slice()[..tags.len() - 1]
    } else {
        tags.as_slice()
    };
    let mut unprocessed = TagList::default();
    for &tag in others {
        unprocessed.push(tag)?;
    }
    Ok((unprocessed, rest))
}
