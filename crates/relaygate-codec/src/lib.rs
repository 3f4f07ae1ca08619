//! Relaygate Codec - packed wire format for cross-chain command batches.
//!
//! A batch of `(target, value, payload)` instructions is carried over a bridge
//! as one contiguous buffer. See [`command`] for the layout.

pub mod command;
pub mod error;

pub use command::{decode, decode_exact, encode, encoded_len, Decoder, HEADER_LEN};
pub use error::CodecError;
