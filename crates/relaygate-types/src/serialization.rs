//! Serialization implementations for relaygate-types
//!
//! Serde uses human-readable strings (hex for byte types, decimal for values)
//! so batch files and config stay editable. Borsh uses raw bytes for
//! persisted state snapshots.

use crate::*;

// Serde implementations
#[cfg(feature = "serde")]
mod serde_impls {
    use super::*;
    use crate::error::strip_hex_prefix;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;

    // Address
    impl Serialize for Address {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Address {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Address::from_str(&s).map_err(D::Error::custom)
        }
    }

    // Selector
    impl Serialize for Selector {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Selector {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Selector::from_str(&s).map_err(D::Error::custom)
        }
    }

    // Hash
    impl Serialize for Hash {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Hash {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Hash::from_str(&s).map_err(D::Error::custom)
        }
    }

    // Role
    impl Serialize for Role {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.to_string().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Role {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Role::from_str(&s).map_err(D::Error::custom)
        }
    }

    /// Instruction as it appears in batch files.
    #[derive(Serialize, Deserialize)]
    struct InstructionRepr {
        target: Address,
        #[serde(default)]
        value: String,
        payload: String,
    }

    impl Serialize for Instruction {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            InstructionRepr {
                target: self.target,
                value: self.value.to_string(),
                payload: format!("0x{}", hex::encode(&self.payload)),
            }
            .serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Instruction {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let repr = InstructionRepr::deserialize(deserializer)?;
            let value = if repr.value.trim().is_empty() {
                0
            } else {
                repr.value.trim().parse::<u128>().map_err(D::Error::custom)?
            };
            let payload = hex::decode(strip_hex_prefix(repr.payload.trim()))
                .map_err(D::Error::custom)?;
            Ok(Instruction::new(repr.target, value, payload))
        }
    }

    impl Serialize for Batch {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            self.instructions().serialize(serializer)
        }
    }

    impl<'de> Deserialize<'de> for Batch {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: Deserializer<'de>,
        {
            let instructions = Vec::<Instruction>::deserialize(deserializer)?;
            Batch::new(instructions).map_err(D::Error::custom)
        }
    }
}

// Borsh implementations
#[cfg(feature = "borsh")]
mod borsh_impls {
    use super::*;
    use borsh::{BorshDeserialize, BorshSerialize};

    // Address - stored as raw bytes
    impl BorshSerialize for Address {
        fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
            writer.write_all(self.as_bytes())
        }
    }

    impl BorshDeserialize for Address {
        fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
            let mut bytes = [0u8; 20];
            reader.read_exact(&mut bytes)?;
            Ok(Address::from_bytes(bytes))
        }
    }

    // Selector - stored as raw bytes
    impl BorshSerialize for Selector {
        fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
            writer.write_all(self.as_bytes())
        }
    }

    impl BorshDeserialize for Selector {
        fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            Ok(Selector::from_bytes(bytes))
        }
    }

    // Hash - stored as raw bytes
    impl BorshSerialize for Hash {
        fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
            writer.write_all(self.as_bytes())
        }
    }

    impl BorshDeserialize for Hash {
        fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
            let mut bytes = [0u8; 32];
            reader.read_exact(&mut bytes)?;
            Ok(Hash::from_bytes(bytes))
        }
    }

    // Role - stored as a one-byte tag
    impl BorshSerialize for Role {
        fn serialize<W: std::io::Write>(&self, writer: &mut W) -> std::io::Result<()> {
            let tag: u8 = match self {
                Role::Admin => 0,
                Role::Proposer => 1,
                Role::Executor => 2,
                Role::Canceller => 3,
            };
            writer.write_all(&[tag])
        }
    }

    impl BorshDeserialize for Role {
        fn deserialize_reader<R: std::io::Read>(reader: &mut R) -> std::io::Result<Self> {
            let tag = u8::deserialize_reader(reader)?;
            Role::ALL.get(tag as usize).copied().ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Invalid role tag: {}", tag),
                )
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(feature = "serde")]
    fn test_address_serde_roundtrip() {
        let original = Address::repeat_byte(0x11);
        let json = serde_json::to_string(&original).unwrap();
        assert_eq!(json, format!("\"0x{}\"", "11".repeat(20)));
        let deserialized: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_batch_from_json() {
        let json = format!(
            r#"[
                {{ "target": "0x{a}", "value": "0", "payload": "0xaabb" }},
                {{ "target": "0x{b}", "value": "1000", "payload": "cc" }}
            ]"#,
            a = "11".repeat(20),
            b = "22".repeat(20),
        );
        let batch: Batch = serde_json::from_str(&json).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.instructions()[0].payload, vec![0xaa, 0xbb]);
        assert_eq!(batch.instructions()[1].value, 1000);
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_empty_batch_json_rejected() {
        assert!(serde_json::from_str::<Batch>("[]").is_err());
    }

    #[test]
    #[cfg(feature = "serde")]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Canceller).unwrap();
        assert_eq!(json, "\"canceller\"");
        assert_eq!(serde_json::from_str::<Role>(&json).unwrap(), Role::Canceller);
    }

    #[test]
    #[cfg(feature = "borsh")]
    fn test_address_borsh_roundtrip() {
        let original = Address::repeat_byte(1);
        let encoded = borsh::to_vec(&original).unwrap();
        assert_eq!(encoded.len(), 20);
        let deserialized: Address = borsh::from_slice(&encoded).unwrap();
        assert_eq!(original, deserialized);
    }

    #[test]
    #[cfg(feature = "borsh")]
    fn test_role_borsh_rejects_bad_tag() {
        assert!(borsh::from_slice::<Role>(&[9u8]).is_err());
        let encoded = borsh::to_vec(&Role::Executor).unwrap();
        assert_eq!(borsh::from_slice::<Role>(&encoded).unwrap(), Role::Executor);
    }
}
