//! Shared governance configuration.
//!
//! Mediators, selector policies, bridge routes and the roles allowed to change
//! them live in one [`GovernanceState`] behind a read-write lock. Admin
//! operations take the write lock; reviews hold the read lock for their whole
//! duration so they never see an update half applied.

use std::collections::BTreeMap;

use parking_lot::{RwLock, RwLockReadGuard};
use relaygate_types::{Address, ChainId, Role, Selector};
use tracing::{info, warn};

use crate::error::{RegistryError, RelayError};
use crate::policy::{PolicyEntry, PolicyUpdate, SelectorPolicyStore};
use crate::registry::MediatorRegistry;
use crate::roles::{transfer_authority, transition_gaps, RoleOp, RoleTable};
use crate::snapshot::StateSnapshot;

/// Configuration state of one chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GovernanceState {
    pub(crate) roles: RoleTable,
    pub(crate) mediators: MediatorRegistry,
    pub(crate) policies: SelectorPolicyStore,
    pub(crate) bridge_routes: BTreeMap<Address, ChainId>,
}

impl GovernanceState {
    pub fn new(admin: Address) -> Self {
        Self {
            roles: RoleTable::with_admin(admin),
            ..Self::default()
        }
    }

    pub fn roles(&self) -> &RoleTable {
        &self.roles
    }

    pub fn mediators(&self) -> &MediatorRegistry {
        &self.mediators
    }

    pub fn policies(&self) -> &SelectorPolicyStore {
        &self.policies
    }

    /// Destination chain of calls to `entrypoint`, if it is a bridge.
    pub fn bridge_route(&self, entrypoint: &Address) -> Option<ChainId> {
        self.bridge_routes.get(entrypoint).copied()
    }

    pub fn bridge_routes(&self) -> impl Iterator<Item = (Address, ChainId)> + '_ {
        self.bridge_routes.iter().map(|(addr, chain)| (*addr, *chain))
    }

    pub fn to_snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            version: StateSnapshot::VERSION,
            roles: self.roles.assignments().collect(),
            mediators: self.mediators.records().collect(),
            policy_history: self.policies.history().to_vec(),
            bridge_routes: self.bridge_routes().collect(),
        }
    }

    pub fn from_snapshot(snapshot: StateSnapshot) -> Result<Self, RelayError> {
        if snapshot.version != StateSnapshot::VERSION {
            return Err(RelayError::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let mut state = Self::default();
        for (role, account) in snapshot.roles {
            state.roles.grant(role, account);
        }
        for (chain_id, mediator) in snapshot.mediators {
            state.mediators.set_mediator(chain_id, mediator)?;
        }
        state.policies = SelectorPolicyStore::from_history(snapshot.policy_history);
        state.bridge_routes = snapshot.bridge_routes.into_iter().collect();
        Ok(state)
    }

    fn require_admin(&self, caller: &Address) -> Result<(), RelayError> {
        if self.roles.has_role(Role::Admin, caller) {
            Ok(())
        } else {
            warn!(%caller, "Privileged call rejected");
            Err(RelayError::Unauthorized {
                caller: *caller,
                role: Role::Admin,
            })
        }
    }
}

/// Lock-protected governance state with admin-checked mutators.
#[derive(Debug, Default)]
pub struct Governance {
    state: RwLock<GovernanceState>,
}

impl Governance {
    pub fn new(admin: Address) -> Self {
        Self::from_state(GovernanceState::new(admin))
    }

    pub fn from_state(state: GovernanceState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Consistent read view; writers wait until it is dropped.
    pub fn read(&self) -> RwLockReadGuard<'_, GovernanceState> {
        self.state.read()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.read().to_snapshot()
    }

    pub fn mediator_of(&self, chain_id: ChainId) -> Option<Address> {
        self.state.read().mediators.mediator_of(chain_id)
    }

    pub fn is_trusted_sender(&self, chain_id: ChainId, sender: &Address) -> bool {
        self.state.read().mediators.is_trusted_sender(chain_id, sender)
    }

    pub fn is_allowed(&self, target: &Address, selector: &Selector, chain_id: ChainId) -> bool {
        self.state.read().policies.is_allowed(target, selector, chain_id)
    }

    pub fn set_mediator(
        &self,
        caller: Address,
        chain_id: ChainId,
        mediator: Address,
    ) -> Result<Option<Address>, RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;
        Ok(state.mediators.set_mediator(chain_id, mediator)?)
    }

    pub fn set_policies(&self, caller: Address, entries: &[PolicyEntry]) -> Result<usize, RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;
        Ok(state.policies.set_policies(entries)?)
    }

    pub fn apply_policy_update(&self, caller: Address, update: PolicyUpdate) -> Result<usize, RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;
        Ok(state.policies.apply_update(update)?)
    }

    /// Mark calls to `entrypoint` as carrying command batches for
    /// `destination`, so the guard inspects what they bridge.
    pub fn set_bridge_route(
        &self,
        caller: Address,
        entrypoint: Address,
        destination: ChainId,
    ) -> Result<(), RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;
        if entrypoint.is_zero() {
            return Err(RegistryError::ZeroAddress(destination).into());
        }
        state.bridge_routes.insert(entrypoint, destination);
        info!(%entrypoint, destination, "Bridge route set");
        Ok(())
    }

    /// Move `roles` from `old` to `new` as sequential revoke-then-grant steps.
    ///
    /// Any step that leaves a role without a holder is logged; the sequence
    /// is applied regardless. Returns the applied plan.
    pub fn transfer_authority(
        &self,
        caller: Address,
        old: Address,
        new: Address,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Vec<RoleOp>, RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;

        let ops = transfer_authority(old, new, roles);
        for gap in transition_gaps(&state.roles, &ops) {
            warn!(%gap, "Authority transition passes through a gap");
        }
        state.roles.apply_sequence(&ops);
        info!(%old, %new, steps = ops.len(), "Authority transferred");
        Ok(ops)
    }

    /// Like [`transfer_authority`](Self::transfer_authority) but applied as
    /// one step that is refused if no admin would remain.
    pub fn transfer_authority_atomic(
        &self,
        caller: Address,
        old: Address,
        new: Address,
        roles: impl IntoIterator<Item = Role>,
    ) -> Result<Vec<RoleOp>, RelayError> {
        let mut state = self.state.write();
        state.require_admin(&caller)?;

        let ops = transfer_authority(old, new, roles);
        state.roles.apply_atomic(&ops)?;
        info!(%old, %new, steps = ops.len(), "Authority swapped atomically");
        Ok(ops)
    }
}
