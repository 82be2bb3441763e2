//! COSE message authentication: `COSE_Mac0` and multi-signer `COSE_Sign`
//! built into and verified from caller-owned buffers.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod cbor;
pub mod cose;
