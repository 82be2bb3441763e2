use hex_literal::hex;
use p256::ecdsa::SigningKey;

pub const PAYLOAD: &[u8] = b"This is the content.";
pub const AAD: &[u8] = b"external";
pub const KID: &[u8] = b"our-secret";
/// Body protected header of every `COSE_Sign` built here, an empty map.
pub const BODY_PROTECTED: &[u8] = &[0xA0];

pub const HMAC_KEY_256: [u8; 32] =
    hex!("849b57219dae48de646d07dbb533566e976686457c1491be3a76dcea6c427188");
pub const HMAC_KEY_384: [u8; 48] = hex!(
    "101112131415161718191a1b1c1d1e1f202122232425262728292a2b2c2d2e2f
     303132333435363738393a3b3c3d3e3f"
);
pub const HMAC_KEY_512: [u8; 64] = hex!(
    "404142434445464748494a4b4c4d4e4f505152535455565758595a5b5c5d5e5f
     606162636465666768696a6b6c6d6e6f707172737475767778797a7b7c7d7e7f"
);

/// Tagged, HMAC 256/256, kid "our-secret", no AAD.
pub const MAC0_HMAC256: [u8; 74] = hex!(
    "d18443a10105a1044a6f75722d73656372657454546869732069732074686520
     636f6e74656e742e5820a1a848d3471f9d61ee49018d244c824772f223ad4f93
     5293f1789fc3a08d8c58"
);

/// Tagged, HMAC 512/512, kid "our-secret", AAD "external", payload detached.
pub const MAC0_HMAC512_AAD_DETACHED: [u8; 86] = hex!(
    "d18443a10107a1044a6f75722d736563726574f65840bfb43c1710d1a4638c80
     ccbda65e0acf6850553b2d6abc4d1252bcf1189943dac68cf0f788f98cf3de6d
     f08164ff07da76c172af42e8001314c37fdc13c2a073"
);

/// Untagged, HMAC 384/384, no kid, content type 60.
pub const MAC0_HMAC384_CT: [u8; 80] = hex!(
    "8443a10106a103183c54546869732069732074686520636f6e74656e742e5830
     85544a66fc300ae9e925c7aab9067927af0027d18b68ebf794098990f7fbaea5
     aaf5f07f838c831cf1a74c6a4082e1ef"
);

/// Short-circuit tag of the `MAC0_HMAC256` payload and protected header.
pub const SHORT_CIRCUIT_TAG_256: [u8; 32] =
    hex!("1e10df68a8953262a018f15fbab18dbefb3666140fe9e84cc590f340aa75f233");

/// P-256 private scalar from RFC 6979, A.2.5.
pub const ECDSA_KEY: [u8; 32] =
    hex!("c9afa9d845ba75166b5c215767b1d6934e50c3db36e89b127b8a622b120f6721");

pub fn signing_key() -> SigningKey {
    SigningKey::from_slice(&ECDSA_KEY).unwrap()
}

/// A second key, for checks that need signers to differ.
pub fn other_signing_key() -> SigningKey {
    SigningKey::from_slice(&HMAC_KEY_256).unwrap()
}
