//! Governance call units and ordered batches of them.

use crate::address::Address;
use crate::error::TypesError;
use crate::selector::Selector;

/// Chain identifier.
pub type ChainId = u64;

/// Largest value representable in the 96-bit wire field.
pub const MAX_VALUE: u128 = (1u128 << 96) - 1;

/// Largest payload length representable in the 32-bit wire field.
pub const MAX_PAYLOAD_LEN: u64 = u32::MAX as u64;

/// One governance call: `(target, value, payload)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    /// Contract to call
    pub target: Address,
    /// Native value attached to the call; must fit 96 bits on the wire
    pub value: u128,
    /// Call data, selector first
    pub payload: Vec<u8>,
}

impl Instruction {
    pub fn new(target: Address, value: u128, payload: Vec<u8>) -> Self {
        Self {
            target,
            value,
            payload,
        }
    }

    /// Build a call from a selector and already-encoded arguments.
    pub fn call(target: Address, selector: Selector, args: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(Selector::LEN + args.len());
        payload.extend_from_slice(selector.as_bytes());
        payload.extend_from_slice(args);
        Self::new(target, 0, payload)
    }

    /// Leading four payload bytes, if present.
    pub fn selector(&self) -> Option<Selector> {
        Selector::from_payload(&self.payload)
    }

    /// Whether value and payload length fit their wire widths.
    pub fn fits_wire(&self) -> bool {
        self.value <= MAX_VALUE && (self.payload.len() as u64) <= MAX_PAYLOAD_LEN
    }
}

/// Ordered, non-empty sequence of instructions that travel and execute as
/// one unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Batch {
    instructions: Vec<Instruction>,
}

impl Batch {
    pub fn new(instructions: Vec<Instruction>) -> Result<Self, TypesError> {
        if instructions.is_empty() {
            return Err(TypesError::EmptyBatch);
        }
        Ok(Self { instructions })
    }

    pub fn single(instruction: Instruction) -> Self {
        Self {
            instructions: vec![instruction],
        }
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Always false; kept for API symmetry with collections.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.instructions.iter()
    }

    pub fn into_instructions(self) -> Vec<Instruction> {
        self.instructions
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.instructions.iter()
    }
}

impl TryFrom<Vec<Instruction>> for Batch {
    type Error = TypesError;

    fn try_from(instructions: Vec<Instruction>) -> Result<Self, Self::Error> {
        Batch::new(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_batch_rejected() {
        assert_eq!(Batch::new(vec![]), Err(TypesError::EmptyBatch));
    }

    #[test]
    fn test_batch_preserves_order() {
        let a = Instruction::new(Address::repeat_byte(1), 0, vec![1]);
        let b = Instruction::new(Address::repeat_byte(2), 5, vec![2]);
        let batch = Batch::new(vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.instructions(), &[a, b]);
    }

    #[test]
    fn test_call_prefixes_selector() {
        let sel = Selector::from_bytes([0xde, 0xad, 0xbe, 0xef]);
        let ix = Instruction::call(Address::repeat_byte(3), sel, &[0x01, 0x02]);
        assert_eq!(ix.payload, vec![0xde, 0xad, 0xbe, 0xef, 0x01, 0x02]);
        assert_eq!(ix.selector(), Some(sel));
    }

    #[test]
    fn test_fits_wire() {
        let ok = Instruction::new(Address::ZERO, MAX_VALUE, vec![]);
        assert!(ok.fits_wire());
        let too_big = Instruction::new(Address::ZERO, MAX_VALUE + 1, vec![]);
        assert!(!too_big.fits_wire());
    }
}
