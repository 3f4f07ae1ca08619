//! Timelock collaborator.
//!
//! The guard forwards approved batches here and authority transitions are
//! replayed against it. [`InMemoryTimelock`] is a delayed-execution timelock
//! with the usual role checks; deployments plug in their own implementation
//! of [`Timelock`].

use std::collections::HashMap;

use relaygate_codec::encode;
use relaygate_types::{Address, Batch, Hash, Instruction, Role};
use tracing::{debug, info};

use crate::error::TimelockError;
use crate::roles::RoleTable;

/// Operations the core consumes from a timelock.
pub trait Timelock {
    /// Queue a batch; requires [`Role::Proposer`].
    fn schedule(&mut self, caller: Address, batch: &Batch) -> Result<Hash, TimelockError>;

    /// Run a ready batch; requires [`Role::Executor`].
    fn execute(&mut self, caller: Address, batch: &Batch) -> Result<Hash, TimelockError>;

    fn has_role(&self, role: Role, account: &Address) -> bool;

    /// Requires [`Role::Admin`].
    fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), TimelockError>;

    /// Requires [`Role::Admin`].
    fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), TimelockError>;
}

/// Identifier of a scheduled batch: blake3 over its wire encoding.
pub fn operation_id(batch: &Batch) -> Result<Hash, TimelockError> {
    Ok(Hash::compute(&encode(batch)?))
}

/// Lifecycle of a scheduled operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Pending,
    Done,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ScheduledOperation {
    pub batch: Batch,
    pub ready_at: u64,
    pub state: OperationState,
}

/// Timelock kept in memory with an explicit clock.
#[derive(Debug, Clone)]
pub struct InMemoryTimelock {
    address: Address,
    roles: RoleTable,
    min_delay: u64,
    now: u64,
    operations: HashMap<Hash, ScheduledOperation>,
    executed: Vec<Instruction>,
}

impl InMemoryTimelock {
    /// New timelock that administers itself.
    pub fn new(address: Address, min_delay: u64) -> Self {
        Self {
            address,
            roles: RoleTable::with_admin(address),
            min_delay,
            now: 0,
            operations: HashMap::new(),
            executed: Vec::new(),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn min_delay(&self) -> u64 {
        self.min_delay
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn advance(&mut self, seconds: u64) {
        self.now = self.now.saturating_add(seconds);
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    /// Bootstrap a role assignment without an admin check.
    pub fn setup_role(&mut self, role: Role, account: Address) {
        self.roles.grant(role, account);
    }

    pub fn operation(&self, id: &Hash) -> Option<&ScheduledOperation> {
        self.operations.get(id)
    }

    pub fn pending_count(&self) -> usize {
        self.operations
            .values()
            .filter(|op| op.state == OperationState::Pending)
            .count()
    }

    /// Every instruction executed so far, in execution order.
    pub fn executed(&self) -> &[Instruction] {
        &self.executed
    }

    /// Cancel a pending operation; requires [`Role::Canceller`].
    pub fn cancel(&mut self, caller: Address, id: &Hash) -> Result<(), TimelockError> {
        self.require(Role::Canceller, caller)?;
        let op = self
            .operations
            .get_mut(id)
            .ok_or(TimelockError::UnknownOperation(*id))?;
        if op.state != OperationState::Pending {
            return Err(TimelockError::AlreadyExecuted(*id));
        }
        op.state = OperationState::Cancelled;
        info!(%id, "Operation cancelled");
        Ok(())
    }

    fn require(&self, role: Role, account: Address) -> Result<(), TimelockError> {
        if self.roles.has_role(role, &account) {
            Ok(())
        } else {
            Err(TimelockError::MissingRole { account, role })
        }
    }
}

impl Timelock for InMemoryTimelock {
    fn schedule(&mut self, caller: Address, batch: &Batch) -> Result<Hash, TimelockError> {
        self.require(Role::Proposer, caller)?;
        let id = operation_id(batch)?;
        if self
            .operations
            .get(&id)
            .is_some_and(|op| op.state != OperationState::Cancelled)
        {
            return Err(TimelockError::AlreadyScheduled(id));
        }

        let ready_at = self.now.saturating_add(self.min_delay);
        self.operations.insert(
            id,
            ScheduledOperation {
                batch: batch.clone(),
                ready_at,
                state: OperationState::Pending,
            },
        );
        info!(%id, %caller, ready_at, calls = batch.len(), "Operation scheduled");
        Ok(id)
    }

    fn execute(&mut self, caller: Address, batch: &Batch) -> Result<Hash, TimelockError> {
        self.require(Role::Executor, caller)?;
        let id = operation_id(batch)?;
        let now = self.now;
        let op = self
            .operations
            .get_mut(&id)
            .ok_or(TimelockError::UnknownOperation(id))?;

        match op.state {
            OperationState::Pending => {}
            OperationState::Done => return Err(TimelockError::AlreadyExecuted(id)),
            OperationState::Cancelled => return Err(TimelockError::UnknownOperation(id)),
        }
        if now < op.ready_at {
            return Err(TimelockError::NotReady {
                id,
                ready_at: op.ready_at,
                now,
            });
        }

        op.state = OperationState::Done;
        self.executed.extend(op.batch.iter().cloned());
        info!(%id, %caller, calls = batch.len(), "Operation executed");
        Ok(id)
    }

    fn has_role(&self, role: Role, account: &Address) -> bool {
        self.roles.has_role(role, account)
    }

    fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), TimelockError> {
        self.require(Role::Admin, caller)?;
        if self.roles.grant(role, account) {
            info!(%role, %account, "Role granted");
        } else {
            debug!(%role, %account, "Role already held");
        }
        Ok(())
    }

    fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> Result<(), TimelockError> {
        self.require(Role::Admin, caller)?;
        if self.roles.revoke(role, account) {
            info!(%role, %account, "Role revoked");
        } else {
            debug!(%role, %account, "Role not held");
        }
        Ok(())
    }
}
