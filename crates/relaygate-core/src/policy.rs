//! Allow-list of `(target, selector, chain)` triples.
//!
//! Lookups are default-deny: a key that was never configured behaves exactly
//! like one explicitly set to `false`. Entries are never deleted, only
//! overwritten, and every overwrite is appended to the change history.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use relaygate_types::{Address, ChainId, Selector};
use tracing::{debug, info};

use crate::error::PolicyError;

/// Lookup key of a policy entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct PolicyKey {
    pub target: Address,
    pub selector: Selector,
    pub chain_id: ChainId,
}

/// One allow-list setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PolicyEntry {
    pub target: Address,
    pub selector: Selector,
    pub chain_id: ChainId,
    pub allowed: bool,
}

impl PolicyEntry {
    pub fn new(target: Address, selector: Selector, chain_id: ChainId, allowed: bool) -> Self {
        Self {
            target,
            selector,
            chain_id,
            allowed,
        }
    }

    pub fn allow(target: Address, selector: Selector, chain_id: ChainId) -> Self {
        Self::new(target, selector, chain_id, true)
    }

    pub fn deny(target: Address, selector: Selector, chain_id: ChainId) -> Self {
        Self::new(target, selector, chain_id, false)
    }

    pub fn key(&self) -> PolicyKey {
        PolicyKey {
            target: self.target,
            selector: self.selector,
            chain_id: self.chain_id,
        }
    }
}

/// Parallel-array form of a policy update, as submitted by governance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyUpdate {
    pub targets: Vec<Address>,
    pub selectors: Vec<Selector>,
    pub chain_ids: Vec<ChainId>,
    pub statuses: Vec<bool>,
}

impl PolicyUpdate {
    /// Zip the arrays into entries. Every array must have the same, non-zero
    /// length.
    pub fn into_entries(self) -> Result<Vec<PolicyEntry>, PolicyError> {
        let len = self.targets.len();
        if len == 0 {
            return Err(PolicyError::MalformedUpdate("empty update".to_string()));
        }
        if self.selectors.len() != len || self.chain_ids.len() != len || self.statuses.len() != len {
            return Err(PolicyError::MalformedUpdate(format!(
                "array lengths differ: targets {}, selectors {}, chain_ids {}, statuses {}",
                len,
                self.selectors.len(),
                self.chain_ids.len(),
                self.statuses.len()
            )));
        }

        Ok(self
            .targets
            .into_iter()
            .zip(self.selectors)
            .zip(self.chain_ids)
            .zip(self.statuses)
            .map(|(((target, selector), chain_id), allowed)| {
                PolicyEntry::new(target, selector, chain_id, allowed)
            })
            .collect())
    }
}

/// Audit record of one applied entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct PolicyChange {
    /// Monotonic position in the history
    pub sequence: u64,
    pub key: PolicyKey,
    /// State before the change; `None` if never configured
    pub previous: Option<bool>,
    pub allowed: bool,
}

/// Selector allow-list with change history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectorPolicyStore {
    entries: BTreeMap<PolicyKey, bool>,
    history: Vec<PolicyChange>,
}

impl SelectorPolicyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its change history.
    pub fn from_history(history: Vec<PolicyChange>) -> Self {
        let mut entries = BTreeMap::new();
        for change in &history {
            entries.insert(change.key, change.allowed);
        }
        Self { entries, history }
    }

    /// Apply a batch of entries atomically.
    ///
    /// The whole update is validated first; if any entry is malformed nothing
    /// is applied. Later entries for the same key win. Returns the number of
    /// entries applied.
    pub fn set_policies(&mut self, entries: &[PolicyEntry]) -> Result<usize, PolicyError> {
        if entries.is_empty() {
            return Err(PolicyError::MalformedUpdate("empty update".to_string()));
        }
        for (index, entry) in entries.iter().enumerate() {
            if entry.target.is_zero() {
                return Err(PolicyError::MalformedUpdate(format!(
                    "entry {} has the zero address as target",
                    index
                )));
            }
            if entry.selector == Selector::ZERO {
                return Err(PolicyError::MalformedUpdate(format!(
                    "entry {} has the zero selector",
                    index
                )));
            }
            if entry.chain_id == 0 {
                return Err(PolicyError::MalformedUpdate(format!(
                    "entry {} has chain id 0",
                    index
                )));
            }
        }

        for entry in entries {
            let key = entry.key();
            let previous = self.entries.insert(key, entry.allowed);
            self.history.push(PolicyChange {
                sequence: self.history.len() as u64,
                key,
                previous,
                allowed: entry.allowed,
            });
        }

        info!(count = entries.len(), "Selector policies updated");
        Ok(entries.len())
    }

    /// Apply a parallel-array update; length mismatches apply nothing.
    pub fn apply_update(&mut self, update: PolicyUpdate) -> Result<usize, PolicyError> {
        let entries = update.into_entries()?;
        self.set_policies(&entries)
    }

    /// Raw state: `None` if never configured, `Some(false)` if explicitly
    /// denied.
    pub fn lookup(&self, target: &Address, selector: &Selector, chain_id: ChainId) -> Option<bool> {
        let key = PolicyKey {
            target: *target,
            selector: *selector,
            chain_id,
        };
        self.entries.get(&key).copied()
    }

    pub fn is_allowed(&self, target: &Address, selector: &Selector, chain_id: ChainId) -> bool {
        let state = self.lookup(target, selector, chain_id);
        debug!(%target, %selector, chain_id, ?state, "Policy lookup");
        state.unwrap_or(false)
    }

    pub fn history(&self) -> &[PolicyChange] {
        &self.history
    }

    /// Current entries, ordered by key.
    pub fn entries(&self) -> impl Iterator<Item = PolicyEntry> + '_ {
        self.entries.iter().map(|(key, allowed)| {
            PolicyEntry::new(key.target, key.selector, key.chain_id, *allowed)
        })
    }

    pub fn allowed_count(&self) -> usize {
        self.entries.values().filter(|allowed| **allowed).count()
    }
}
