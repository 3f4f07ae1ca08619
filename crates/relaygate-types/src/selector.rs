use crate::error::{strip_hex_prefix, TypesError};
use crate::hash::keccak256;
use std::fmt;
use std::str::FromStr;

/// 4-byte function identifier, the leading bytes of a call payload.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Selector([u8; 4]);

impl Selector {
    pub const LEN: usize = 4;
    pub const ZERO: Self = Self([0u8; 4]);

    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }

    /// Selector of a canonical function signature such as
    /// `transfer(address,uint256)`: first four bytes of its Keccak-256 digest.
    pub fn from_signature(signature: &str) -> Result<Self, TypesError> {
        let open = signature
            .find('(')
            .ok_or_else(|| TypesError::InvalidSignature(signature.to_string()))?;
        if open == 0
            || !signature.ends_with(')')
            || signature.chars().any(char::is_whitespace)
        {
            return Err(TypesError::InvalidSignature(signature.to_string()));
        }

        let digest = keccak256(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..4]);
        Ok(Self(bytes))
    }

    /// Leading four bytes of a call payload, if it has that many.
    pub fn from_payload(payload: &[u8]) -> Option<Self> {
        let head: [u8; 4] = payload.get(..Self::LEN)?.try_into().ok()?;
        Some(Self(head))
    }

    /// Convert to hex string without 0x prefix
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector(0x{})", self.to_hex())
    }
}

impl FromStr for Selector {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))?;
        let arr: [u8; 4] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidSelectorLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl From<[u8; 4]> for Selector {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_selectors() {
        let transfer = Selector::from_signature("transfer(address,uint256)").unwrap();
        assert_eq!(transfer.to_hex(), "a9059cbb");

        let approve = Selector::from_signature("approve(address,uint256)").unwrap();
        assert_eq!(approve.to_hex(), "095ea7b3");
    }

    #[test]
    fn test_invalid_signatures() {
        assert!(Selector::from_signature("transfer").is_err());
        assert!(Selector::from_signature("(address)").is_err());
        assert!(Selector::from_signature("transfer(address, uint256)").is_err());
        assert!(Selector::from_signature("transfer(address").is_err());
    }

    #[test]
    fn test_from_payload() {
        let payload = [0xa9, 0x05, 0x9c, 0xbb, 0x00, 0x01];
        assert_eq!(
            Selector::from_payload(&payload),
            Some(Selector::from_bytes([0xa9, 0x05, 0x9c, 0xbb]))
        );
        assert_eq!(Selector::from_payload(&[0xaa, 0xbb, 0xcc]), None);
        assert_eq!(Selector::from_payload(&[]), None);
    }

    #[test]
    fn test_selector_parse() {
        let sel: Selector = "0xa9059cbb".parse().unwrap();
        assert_eq!(sel.to_string(), "0xa9059cbb");
        assert_eq!(
            "0xa9059c".parse::<Selector>(),
            Err(TypesError::InvalidSelectorLength(3))
        );
    }
}
