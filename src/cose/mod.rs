//! COSE message authentication.
//!
//! [`Mac0SignCtx`] and [`Mac0VerifyCtx`] build and check `COSE_Mac0`
//! messages with a single HMAC key. [`SignCtx`] and [`SignVerifyCtx`] do the
//! same for `COSE_Sign` messages carrying one signature per [`Signer`].

mod crypto;
mod error;
mod headers;
mod mac0;
mod options;
mod sign;
mod signer;
#[cfg(test)]
mod test_vectors;
mod util;

pub use crypto::{
    hmac_to_hash_alg, sig_size, tag_size, HashCtx, HmacCtx, SymmetricKey, COSE_ALGORITHM_ES256,
    COSE_ALGORITHM_HMAC256, COSE_ALGORITHM_HMAC384, COSE_ALGORITHM_HMAC512,
    COSE_ALGORITHM_SHA_256, COSE_ALGORITHM_SHA_384, COSE_ALGORITHM_SHA_512, HMAC_TAG_MAX_SIZE,
    SIGNATURE_MAX_SIZE,
};
pub use error::Error;
pub use headers::{
    decode_headers, encode_headers, ContentType, DecodedHeaders, HeaderParam, ParamList,
    ParamValue, Parameters,
};
pub use mac0::{Authenticity, EncodedParameters, Mac0SignCtx, Mac0Verification, Mac0VerifyCtx};
pub use options::Options;
pub use sign::{SignCtx, SignVerification, SignVerifyCtx};
pub use signer::{CoseSignature, EcdsaSigner, EcdsaVerifier, Signer, Verifier};
#[cfg(feature = "short_circuit")]
pub use signer::{ShortCircuitSigner, ShortCircuitVerifier};
pub use util::ToBeAuthenticated;

pub type Result<T> = core::result::Result<T, Error>;

/// CBOR tag of a `COSE_Mac0` message.
pub const CBOR_TAG_COSE_MAC0: u64 = 17;
/// CBOR tag of a `COSE_Sign` message.
pub const CBOR_TAG_COSE_SIGN: u64 = 98;

pub const HEADER_PARAM_ALG: i64 = 1;
pub const HEADER_PARAM_CRIT: i64 = 2;
pub const HEADER_PARAM_CONTENT_TYPE: i64 = 3;
pub const HEADER_PARAM_KID: i64 = 4;
pub const HEADER_PARAM_IV: i64 = 5;
pub const HEADER_PARAM_PARTIAL_IV: i64 = 6;

/// Header parameters a single map may hold, and labels a `crit` may list.
pub const MAX_PARAMETERS: usize = 10;
/// Signatures a `COSE_Sign` message may carry.
pub const MAX_SIGNATURES: usize = 8;

pub use crate::cbor::MAX_TAGS_TO_RETURN;
