use core::ops::BitOr;

use super::{Error, Result};

/// Option flags for signing and verification.
///
/// Every operation accepts only the flags that mean something to it.
/// Unknown bits, bits that belong to the other side, and
/// `TAG_REQUIRED | TAG_PROHIBITED` together are rejected with
/// [`Error::InvalidOptions`] before any output is produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options(u32);

impl Options {
    pub const NONE: Options = Options(0);
    /// Sign: produce a keyless short-circuit tag. Verify: accept one.
    /// Test use only.
    pub const SHORT_CIRCUIT_TAG: Options = Options(0x01);
    /// Sign: leave out the outer CBOR tag.
    pub const OMIT_CBOR_TAG: Options = Options(0x02);
    /// Verify: fail unless a kid is present.
    pub const REQUIRE_KID: Options = Options(0x04);
    /// Verify: fail unless the message carries its COSE tag.
    pub const TAG_REQUIRED: Options = Options(0x08);
    /// Verify: fail if the message carries its COSE tag.
    pub const TAG_PROHIBITED: Options = Options(0x10);
    /// Verify: decode and return the payload without checking the tag.
    /// The result is marked unchecked.
    pub const DECODE_ONLY: Options = Options(0x20);

    pub(crate) const MAC0_SIGN: Options =
        Options(Self::SHORT_CIRCUIT_TAG.0 | Self::OMIT_CBOR_TAG.0);
    pub(crate) const SIGN: Options = Self::OMIT_CBOR_TAG;
    pub(crate) const VERIFY: Options = Options(
        Self::SHORT_CIRCUIT_TAG.0
            | Self::REQUIRE_KID.0
            | Self::TAG_REQUIRED.0
            | Self::TAG_PROHIBITED.0
            | Self::DECODE_ONLY.0,
    );
    /// Short-circuit signatures are chosen by verifier, not by flag.
    pub(crate) const SIGN_VERIFY: Options = Options(
        Self::REQUIRE_KID.0 | Self::TAG_REQUIRED.0 | Self::TAG_PROHIBITED.0 | Self::DECODE_ONLY.0,
    );

    pub const fn from_bits(bits: u32) -> Options {
        Options(bits)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Options) -> bool {
        self.0 & other.0 == other.0
    }

    /// Checks these flags against the set an operation accepts.
    pub(crate) fn check(self, allowed: Options) -> Result<Options> {
        let both_tag_rules = Self::TAG_REQUIRED.0 | Self::TAG_PROHIBITED.0;
        if self.0 & !allowed.0 != 0 || self.0 & both_tag_rules == both_tag_rules {
            log::debug!("rejecting option flags {:#x}", self.0);
            return Err(Error::InvalidOptions(self.0));
        }
        Ok(self)
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        Options(self.0 | rhs.0)
    }
}
