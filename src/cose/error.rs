use crate::cbor::CborError;

/// The result codes of every COSE operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("signing algorithm is not supported")]
    UnsupportedSigningAlg,
    #[error("hash algorithm is not supported")]
    UnsupportedHash,
    #[error("tag or signature buffer too small: have {have}, want {want}")]
    SigBufferSize { have: usize, want: usize },
    #[error("output buffer too small")]
    TooSmall,
    #[error("CBOR could not be formatted")]
    CborFormatting,
    #[error("CBOR is not well formed")]
    CborNotWellFormed,
    #[error("header parameter appears more than once")]
    DuplicateParameter,
    #[error("header parameter is malformed or has the wrong type")]
    ParameterCbor,
    #[error("header parameter must be protected")]
    ParameterNotProtected,
    #[error("critical header parameter is not understood")]
    UnknownCriticalParameter,
    #[error("too many header parameters")]
    TooManyParameters,
    #[error("no algorithm ID header parameter")]
    NoAlgId,
    #[error("no kid header parameter")]
    NoKid,
    #[error("short-circuit signing is not compiled in")]
    ShortCircuitSigDisabled,
    #[error("MAC validation failed")]
    MacValidationFailed,
    #[error("signature verification failed")]
    SigVerify,
    #[error("too many CBOR tags on the message")]
    TooManyTags,
    #[error("message is not tagged as required")]
    IncorrectlyTagged,
    #[error("message has a detached payload and none was supplied")]
    NoPayload,
    #[error("message carries a payload but a detached one was supplied")]
    UnexpectedPayload,
    #[error("invalid option flags: {0:#x}")]
    InvalidOptions(u32),
    #[error("no key was set")]
    MissingKey,
    #[error("key is not usable with this algorithm")]
    InvalidKey,
    #[error("no signers given")]
    NoSigners,
    #[error("too many signatures on the message")]
    TooManySignatures,
    #[error("signature count does not match verifiers: have {have}, want {want}")]
    SignatureCount { have: usize, want: usize },
    #[error("crypto operation failed")]
    CryptoFailure,
}

impl From<CborError> for Error {
    fn from(e: CborError) -> Error {
        match e {
            CborError::BufferTooSmall => Error::TooSmall,
            CborError::TooManyTags => Error::TooManyTags,
            CborError::NotWellFormed => Error::CborNotWellFormed,
            CborError::NestingTooDeep
            | CborError::CloseMismatch
            | CborError::OddMapItems
            | CborError::StillOpen => Error::CborFormatting,
        }
    }
}
