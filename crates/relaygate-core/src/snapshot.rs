//! Borsh-encoded persistence of governance state.

use std::path::Path;

use borsh::{BorshDeserialize, BorshSerialize};
use relaygate_types::{Address, ChainId, Hash, Role};
use tracing::debug;

use crate::error::RelayError;
use crate::policy::PolicyChange;

/// Everything needed to rebuild a [`GovernanceState`](crate::GovernanceState).
///
/// Policies are stored as their full change history so audit information
/// survives a restart.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct StateSnapshot {
    pub version: u8,
    pub roles: Vec<(Role, Address)>,
    pub mediators: Vec<(ChainId, Address)>,
    pub policy_history: Vec<PolicyChange>,
    pub bridge_routes: Vec<(Address, ChainId)>,
}

impl StateSnapshot {
    pub const VERSION: u8 = 1;

    pub fn to_bytes(&self) -> Result<Vec<u8>, RelayError> {
        to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        from_bytes(bytes)
    }

    pub fn save(&self, path: &Path) -> Result<(), RelayError> {
        save(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, RelayError> {
        load(path)
    }
}

/// Delivery progress of a [`RemoteReceiver`](crate::RemoteReceiver).
///
/// Without it a restarted receiver would execute redelivered messages again.
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct ReceiverLedger {
    pub version: u8,
    /// Messages executed to completion, sorted
    pub processed: Vec<Hash>,
    /// Messages whose leading calls ran before a failure, with the number of
    /// calls that ran
    pub partial: Vec<(Hash, u64)>,
}

impl ReceiverLedger {
    pub const VERSION: u8 = 1;

    pub fn to_bytes(&self) -> Result<Vec<u8>, RelayError> {
        to_bytes(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RelayError> {
        from_bytes(bytes)
    }

    pub fn save(&self, path: &Path) -> Result<(), RelayError> {
        save(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, RelayError> {
        load(path)
    }
}

fn to_bytes<T: BorshSerialize>(value: &T) -> Result<Vec<u8>, RelayError> {
    borsh::to_vec(value).map_err(|e| RelayError::Snapshot(e.to_string()))
}

fn from_bytes<T: BorshDeserialize>(bytes: &[u8]) -> Result<T, RelayError> {
    borsh::from_slice(bytes).map_err(|e| RelayError::Snapshot(e.to_string()))
}

fn save<T: BorshSerialize>(value: &T, path: &Path) -> Result<(), RelayError> {
    let bytes = to_bytes(value)?;
    std::fs::write(path, &bytes).map_err(|e| {
        RelayError::Snapshot(format!("failed to write '{}': {}", path.display(), e))
    })?;
    debug!(path = %path.display(), bytes = bytes.len(), "Snapshot saved");
    Ok(())
}

fn load<T: BorshDeserialize>(path: &Path) -> Result<T, RelayError> {
    let bytes = std::fs::read(path).map_err(|e| {
        RelayError::Snapshot(format!("failed to read '{}': {}", path.display(), e))
    })?;
    from_bytes(&bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyKey;
    use relaygate_types::Selector;
    use tempfile::TempDir;

    fn sample() -> StateSnapshot {
        StateSnapshot {
            version: StateSnapshot::VERSION,
            roles: vec![(Role::Admin, Address::repeat_byte(1))],
            mediators: vec![(100, Address::repeat_byte(2))],
            policy_history: vec![PolicyChange {
                sequence: 0,
                key: PolicyKey {
                    target: Address::repeat_byte(3),
                    selector: Selector::from_bytes([1, 2, 3, 4]),
                    chain_id: 100,
                },
                previous: None,
                allowed: true,
            }],
            bridge_routes: vec![(Address::repeat_byte(4), 100)],
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.bin");

        let snapshot = sample();
        snapshot.save(&path).unwrap();
        assert_eq!(StateSnapshot::load(&path).unwrap(), snapshot);
    }

    #[test]
    fn test_corrupt_bytes_rejected() {
        let mut bytes = sample().to_bytes().unwrap();
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(
            StateSnapshot::from_bytes(&bytes),
            Err(RelayError::Snapshot(_))
        ));
    }

    #[test]
    fn test_receiver_ledger_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.bin");

        let ledger = ReceiverLedger {
            version: ReceiverLedger::VERSION,
            processed: vec![Hash::compute(b"a"), Hash::compute(b"b")],
            partial: vec![(Hash::compute(b"c"), 2)],
        };
        ledger.save(&path).unwrap();
        assert_eq!(ReceiverLedger::load(&path).unwrap(), ledger);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(StateSnapshot::load(&dir.path().join("absent.bin")).is_err());
    }
}
