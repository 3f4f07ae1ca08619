//! Relaygate Types - Core type definitions for the governance relay.
//!
//! This crate provides the fundamental types shared by every other crate:
//! - Addresses (20-byte, hex encoded, constant-time comparable)
//! - Function selectors (4-byte)
//! - Hashes (32-byte, blake3 digests) and Keccak-256 helpers
//! - Timelock roles and their well-known identifiers
//! - Instructions and Batches

pub mod address;
pub mod hash;
pub mod selector;
pub mod role;
pub mod instruction;
pub mod error;

#[cfg(any(feature = "serde", feature = "borsh"))]
mod serialization;

pub use address::Address;
pub use hash::{keccak256, Hash};
pub use selector::Selector;
pub use role::Role;
pub use instruction::{Batch, ChainId, Instruction, MAX_PAYLOAD_LEN, MAX_VALUE};
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Address, Batch, ChainId, Hash, Instruction, Role, Selector, TypesError,
    };
}
