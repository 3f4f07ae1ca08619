//! Packed command buffer.
//!
//! Each instruction is laid out back to back with no padding:
//!
//! ```text
//! | target (20) | value (12, BE) | payload length (4, BE) | payload (length) |
//! ```
//!
//! The layout is bit-exact with deployed remote mediators; any change needs a
//! new encoding version.

use relaygate_types::{Address, Batch, Instruction, MAX_PAYLOAD_LEN, MAX_VALUE};
use tracing::debug;

use crate::error::CodecError;

/// Width of the target field.
pub const TARGET_LEN: usize = 20;
/// Width of the value field.
pub const VALUE_LEN: usize = 12;
/// Width of the payload length field.
pub const LENGTH_LEN: usize = 4;
/// Fixed header preceding every payload.
pub const HEADER_LEN: usize = TARGET_LEN + VALUE_LEN + LENGTH_LEN;

/// Exact size of the encoding of `batch`.
pub fn encoded_len(batch: &Batch) -> usize {
    batch.iter().map(|ix| HEADER_LEN + ix.payload.len()).sum()
}

/// Encode a batch into one contiguous buffer.
///
/// Fails with [`CodecError::FieldOverflow`] instead of truncating a value
/// wider than 96 bits or a payload longer than `u32::MAX` bytes.
pub fn encode(batch: &Batch) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(encoded_len(batch));
    for (index, ix) in batch.iter().enumerate() {
        write_instruction(&mut out, index, ix)?;
    }
    Ok(out)
}

fn write_instruction(out: &mut Vec<u8>, index: usize, ix: &Instruction) -> Result<(), CodecError> {
    if ix.value > MAX_VALUE {
        return Err(CodecError::FieldOverflow {
            index,
            field: "value",
            bits: 96,
        });
    }
    if ix.payload.len() as u64 > MAX_PAYLOAD_LEN {
        return Err(CodecError::FieldOverflow {
            index,
            field: "payload length",
            bits: 32,
        });
    }

    out.extend_from_slice(ix.target.as_bytes());
    out.extend_from_slice(&ix.value.to_be_bytes()[16 - VALUE_LEN..]);
    out.extend_from_slice(&(ix.payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&ix.payload);
    Ok(())
}

/// Decode a buffer that holds nothing but instructions.
///
/// This never returns [`CodecError::TrailingBytes`]. A leftover fragment after
/// the last complete instruction is reported as [`CodecError::TruncatedInput`]:
/// without an instruction count the decoder cannot tell a cut-off header from
/// stray bytes. Use [`decode_exact`] when the count is known and stray bytes
/// must be reported as trailing.
pub fn decode(bytes: &[u8]) -> Result<Batch, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::EmptyBatch);
    }

    let mut decoder = Decoder::new(bytes);
    let mut instructions = Vec::new();
    while !decoder.is_finished() {
        instructions.push(decoder.next_instruction()?);
    }

    debug!(count = instructions.len(), bytes = bytes.len(), "Decoded command batch");
    Batch::new(instructions).map_err(|_| CodecError::EmptyBatch)
}

/// Decode exactly `count` instructions and require the buffer to end there.
pub fn decode_exact(bytes: &[u8], count: usize) -> Result<Batch, CodecError> {
    if count == 0 {
        return Err(CodecError::EmptyBatch);
    }

    let mut decoder = Decoder::new(bytes);
    let mut instructions = Vec::with_capacity(count);
    for _ in 0..count {
        instructions.push(decoder.next_instruction()?);
    }
    decoder.finish()?;

    Batch::new(instructions).map_err(|_| CodecError::EmptyBatch)
}

/// Cursor over a command buffer.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the next instruction. On error the cursor does not move.
    pub fn next_instruction(&mut self) -> Result<Instruction, CodecError> {
        let remaining = self.remaining();
        if remaining < HEADER_LEN {
            return Err(CodecError::TruncatedInput {
                offset: self.offset,
                needed: HEADER_LEN,
                remaining,
            });
        }

        let header = &self.buf[self.offset..self.offset + HEADER_LEN];

        let mut target = [0u8; TARGET_LEN];
        target.copy_from_slice(&header[..TARGET_LEN]);

        let mut value = [0u8; 16];
        value[16 - VALUE_LEN..].copy_from_slice(&header[TARGET_LEN..TARGET_LEN + VALUE_LEN]);

        let mut length = [0u8; LENGTH_LEN];
        length.copy_from_slice(&header[TARGET_LEN + VALUE_LEN..]);
        let length = u32::from_be_bytes(length) as usize;

        let body = self.offset + HEADER_LEN;
        let available = remaining - HEADER_LEN;
        if length > available {
            return Err(CodecError::TruncatedInput {
                offset: body,
                needed: length,
                remaining: available,
            });
        }

        let payload = self.buf[body..body + length].to_vec();
        self.offset = body + length;

        Ok(Instruction::new(
            Address::from_bytes(target),
            u128::from_be_bytes(value),
            payload,
        ))
    }

    /// Require the buffer to be fully consumed.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(CodecError::TrailingBytes {
                offset: self.offset,
                remaining,
            }),
        }
    }
}
