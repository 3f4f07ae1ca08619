//! Trusted bridge mediators, one per chain.
//!
//! An inbound instruction is only acted on when the address that delivered
//! it is the registered mediator for the chain it claims to come from. A
//! chain without a record is treated exactly like a distrusted one.

use std::collections::BTreeMap;

use relaygate_types::{Address, ChainId};
use tracing::{debug, info};

use crate::error::RegistryError;

/// Per-chain mapping to the single trusted mediator address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediatorRegistry {
    records: BTreeMap<ChainId, Address>,
}

impl MediatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert the mediator for `chain_id`, returning the one it replaced.
    ///
    /// Setting the same address twice is a no-op.
    pub fn set_mediator(
        &mut self,
        chain_id: ChainId,
        mediator: Address,
    ) -> Result<Option<Address>, RegistryError> {
        if mediator.is_zero() {
            return Err(RegistryError::ZeroAddress(chain_id));
        }

        let previous = self.records.insert(chain_id, mediator);
        if previous != Some(mediator) {
            info!(chain_id, %mediator, previous = ?previous, "Mediator updated");
        }
        Ok(previous)
    }

    pub fn mediator_of(&self, chain_id: ChainId) -> Option<Address> {
        self.records.get(&chain_id).copied()
    }

    /// True iff `sender` is the registered mediator for `chain_id`.
    pub fn is_trusted_sender(&self, chain_id: ChainId, sender: &Address) -> bool {
        match self.records.get(&chain_id) {
            Some(mediator) => mediator.ct_matches(sender),
            None => false,
        }
    }

    /// Like [`is_trusted_sender`](Self::is_trusted_sender) but says why a
    /// sender was refused.
    pub fn authenticate(&self, chain_id: ChainId, sender: &Address) -> Result<Address, RegistryError> {
        let mediator = self
            .records
            .get(&chain_id)
            .ok_or(RegistryError::UnknownChain(chain_id))?;

        if !mediator.ct_matches(sender) {
            debug!(chain_id, %sender, "Sender does not match registered mediator");
            return Err(RegistryError::UntrustedSender {
                chain_id,
                sender: *sender,
            });
        }
        Ok(*mediator)
    }

    /// All records, ordered by chain id.
    pub fn records(&self) -> impl Iterator<Item = (ChainId, Address)> + '_ {
        self.records.iter().map(|(chain, addr)| (*chain, *addr))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
