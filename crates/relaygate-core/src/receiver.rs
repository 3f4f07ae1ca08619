//! Remote-side entry point for bridged batches.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use relaygate_codec::decode;
use relaygate_types::{Address, Hash, Instruction};
use tracing::{debug, info, warn};

use crate::bridge::BridgeMessage;
use crate::error::ReceiveError;
use crate::snapshot::ReceiverLedger;
use crate::state::Governance;

/// Performs the individual calls of a delivered batch.
pub trait Executor {
    type Error: fmt::Display;

    fn call(&mut self, instruction: &Instruction) -> Result<(), Self::Error>;
}

/// Executor that records every call and can be told to fail on a target.
#[derive(Debug, Clone, Default)]
pub struct RecordingExecutor {
    calls: Vec<Instruction>,
    failing_target: Option<Address>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every call to `target`.
    pub fn failing_on(target: Address) -> Self {
        Self {
            calls: Vec::new(),
            failing_target: Some(target),
        }
    }

    pub fn set_failing_target(&mut self, target: Option<Address>) {
        self.failing_target = target;
    }

    pub fn calls(&self) -> &[Instruction] {
        &self.calls
    }
}

impl Executor for RecordingExecutor {
    type Error = String;

    fn call(&mut self, instruction: &Instruction) -> Result<(), String> {
        if self.failing_target == Some(instruction.target) {
            return Err(format!("call to {} reverted", instruction.target));
        }
        self.calls.push(instruction.clone());
        Ok(())
    }
}

/// What happened to a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// `calls` counts the calls made by this delivery. A redelivery after a
    /// failure skips the calls that already ran.
    Executed { id: Hash, calls: usize },
    /// Already processed; nothing was executed.
    Duplicate(Hash),
}

/// Authenticates, deduplicates, decodes and executes bridged batches.
pub struct RemoteReceiver<E: Executor> {
    governance: Arc<Governance>,
    executor: E,
    processed: HashSet<Hash>,
    /// Calls already made for messages that failed part way
    partial: HashMap<Hash, usize>,
}

impl<E: Executor> RemoteReceiver<E> {
    /// Trust decisions are read from `governance`'s mediator registry at the
    /// time of each delivery.
    pub fn new(governance: Arc<Governance>, executor: E) -> Self {
        Self {
            governance,
            executor,
            processed: HashSet::new(),
            partial: HashMap::new(),
        }
    }

    /// Receiver that continues from a previously saved [`ReceiverLedger`].
    pub fn restore(governance: Arc<Governance>, executor: E, ledger: ReceiverLedger) -> Self {
        debug!(
            processed = ledger.processed.len(),
            partial = ledger.partial.len(),
            "Receiver ledger restored"
        );
        Self {
            governance,
            executor,
            processed: ledger.processed.into_iter().collect(),
            partial: ledger
                .partial
                .into_iter()
                .map(|(id, done)| (id, done as usize))
                .collect(),
        }
    }

    /// Delivery progress to persist across restarts.
    pub fn ledger(&self) -> ReceiverLedger {
        let mut processed: Vec<Hash> = self.processed.iter().copied().collect();
        processed.sort();
        let mut partial: Vec<(Hash, u64)> = self
            .partial
            .iter()
            .map(|(id, done)| (*id, *done as u64))
            .collect();
        partial.sort();
        ReceiverLedger {
            version: ReceiverLedger::VERSION,
            processed,
            partial,
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn is_processed(&self, id: &Hash) -> bool {
        self.processed.contains(id)
    }

    /// Number of leading calls of `id` that ran before it failed.
    pub fn calls_done(&self, id: &Hash) -> usize {
        self.partial.get(id).copied().unwrap_or(0)
    }

    /// Handle one delivery.
    ///
    /// The whole batch is decoded before the first call, so a malformed
    /// message executes nothing. If a call fails, the calls before it have
    /// already taken effect and the message stays unprocessed. A redelivery
    /// resumes at the failed call, so every call runs at most once.
    pub fn on_receive(&mut self, message: &BridgeMessage) -> Result<ReceiveOutcome, ReceiveError> {
        let authenticated = self
            .governance
            .read()
            .mediators()
            .authenticate(message.source_chain, &message.sender);
        if let Err(err) = authenticated {
            warn!(
                source_chain = message.source_chain,
                sender = %message.sender,
                "Rejected message from untrusted sender"
            );
            return Err(err.into());
        }

        let id = message.id();
        if self.processed.contains(&id) {
            debug!(%id, "Duplicate delivery ignored");
            return Ok(ReceiveOutcome::Duplicate(id));
        }

        let batch = decode(&message.data)?;
        let start = self.calls_done(&id);
        if start > 0 {
            debug!(%id, start, "Resuming partially executed message");
        }
        for (index, instruction) in batch.iter().enumerate().skip(start) {
            if let Err(reason) = self.executor.call(instruction) {
                warn!(%id, index, error = %reason, "Bridged call failed");
                if index > 0 {
                    self.partial.insert(id, index);
                }
                return Err(ReceiveError::ExecutionFailed {
                    index,
                    reason: reason.to_string(),
                });
            }
        }

        self.partial.remove(&id);
        self.processed.insert(id);
        let calls = batch.len().saturating_sub(start);
        info!(%id, source_chain = message.source_chain, calls, "Bridged batch executed");
        Ok(ReceiveOutcome::Executed { id, calls })
    }
}

impl<E: Executor + fmt::Debug> fmt::Debug for RemoteReceiver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteReceiver")
            .field("executor", &self.executor)
            .field("processed", &self.processed.len())
            .field("partial", &self.partial.len())
            .finish()
    }
}
