//! Policy guard in front of the timelock.
//!
//! A batch is reviewed instruction by instruction against the selector
//! allow-list and is only handed to the timelock if every instruction passes.
//! Instructions that call a registered bridge entrypoint carry an encoded
//! batch for another chain; those inner instructions are checked too, under
//! the destination chain id.

use std::fmt;

use relaygate_codec::decode;
use relaygate_types::{Address, Batch, ChainId, Hash, Instruction, Selector};
use tracing::{debug, info, warn};

use crate::error::GuardError;
use crate::state::{Governance, GovernanceState};
use crate::timelock::Timelock;

/// Which timelock entrypoint an approved batch is handed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForwardMode {
    #[default]
    Schedule,
    Execute,
}

impl fmt::Display for ForwardMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardMode::Schedule => write!(f, "schedule"),
            ForwardMode::Execute => write!(f, "execute"),
        }
    }
}

/// Reviews batches and forwards approved ones as `operator`.
#[derive(Debug, Clone)]
pub struct Guard {
    operator: Address,
}

impl Guard {
    /// `operator` is the account the guard calls the timelock as; it needs
    /// the proposer and/or executor role there.
    pub fn new(operator: Address) -> Self {
        Self { operator }
    }

    pub fn operator(&self) -> Address {
        self.operator
    }

    /// Check every instruction of `batch` for `chain_id`.
    ///
    /// Returns the first offending instruction. Touches no state.
    pub fn review(
        &self,
        state: &GovernanceState,
        batch: &Batch,
        chain_id: ChainId,
    ) -> Result<(), GuardError> {
        for (index, instruction) in batch.iter().enumerate() {
            let selector = instruction.selector().ok_or(GuardError::PayloadTooShort {
                index,
                length: instruction.payload.len(),
            })?;

            if !state.policies().is_allowed(&instruction.target, &selector, chain_id) {
                return Err(GuardError::PolicyViolation {
                    index,
                    target: instruction.target,
                    selector,
                });
            }

            if let Some(destination) = state.bridge_route(&instruction.target) {
                review_bridged(state, index, instruction, destination)?;
            }
        }

        debug!(calls = batch.len(), chain_id, "Batch passed review");
        Ok(())
    }

    /// Review `batch` and, if it passes, hand it unchanged to `timelock`.
    ///
    /// The governance read lock is held across both steps. On any error
    /// nothing has been forwarded.
    pub fn review_and_forward<T: Timelock + ?Sized>(
        &self,
        governance: &Governance,
        timelock: &mut T,
        batch: &Batch,
        chain_id: ChainId,
        mode: ForwardMode,
    ) -> Result<Hash, GuardError> {
        let state = governance.read();

        if let Err(err) = self.review(&state, batch, chain_id) {
            warn!(chain_id, calls = batch.len(), error = %err, "Batch rejected");
            return Err(err);
        }

        let id = match mode {
            ForwardMode::Schedule => timelock.schedule(self.operator, batch)?,
            ForwardMode::Execute => timelock.execute(self.operator, batch)?,
        };
        drop(state);

        info!(%id, chain_id, %mode, calls = batch.len(), "Batch forwarded");
        Ok(id)
    }
}

fn review_bridged(
    state: &GovernanceState,
    index: usize,
    instruction: &Instruction,
    destination: ChainId,
) -> Result<(), GuardError> {
    let inner = decode(&instruction.payload[Selector::LEN..])
        .map_err(|error| GuardError::BridgedPayload { index, error })?;

    for (inner_index, call) in inner.iter().enumerate() {
        let selector = call.selector().ok_or(GuardError::BridgedPayloadTooShort {
            index,
            inner_index,
            length: call.payload.len(),
        })?;

        if !state.policies().is_allowed(&call.target, &selector, destination) {
            return Err(GuardError::BridgedViolation {
                index,
                inner_index,
                chain_id: destination,
                target: call.target,
                selector,
            });
        }
    }

    debug!(index, destination, calls = inner.len(), "Bridged batch passed review");
    Ok(())
}
