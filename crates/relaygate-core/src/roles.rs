//! Role holders and authority transitions.
//!
//! Each role maps to a set of holder addresses. For a given holder a role is
//! either assigned or not; granting an assigned role and revoking an
//! unassigned one change nothing.
//!
//! [`transfer_authority`] plans a handover as every revoke for the old
//! controller followed by every grant for the new one. Applied one step at a
//! time, that order leaves a window in which a role can have no holder at
//! all. [`transition_gaps`] reports such windows without preventing them;
//! [`RoleTable::apply_atomic`] is the opt-in all-or-nothing alternative.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use relaygate_types::{Address, Role};
use tracing::{info, warn};

use crate::error::RoleError;
use crate::timelock::Timelock;

/// Single role mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoleOp {
    Grant { role: Role, account: Address },
    Revoke { role: Role, account: Address },
}

impl RoleOp {
    pub fn role(&self) -> Role {
        match self {
            RoleOp::Grant { role, .. } | RoleOp::Revoke { role, .. } => *role,
        }
    }

    pub fn account(&self) -> Address {
        match self {
            RoleOp::Grant { account, .. } | RoleOp::Revoke { account, .. } => *account,
        }
    }
}

impl fmt::Display for RoleOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleOp::Grant { role, account } => write!(f, "grant {} to {}", role, account),
            RoleOp::Revoke { role, account } => write!(f, "revoke {} from {}", role, account),
        }
    }
}

/// Plan moving `roles` from `old` to `new`.
///
/// All revokes come first, then all grants, each in role order
/// (admin, proposer, executor, canceller). Duplicate roles are ignored.
pub fn transfer_authority(
    old: Address,
    new: Address,
    roles: impl IntoIterator<Item = Role>,
) -> Vec<RoleOp> {
    let roles: BTreeSet<Role> = roles.into_iter().collect();

    let revokes = roles.iter().map(|&role| RoleOp::Revoke { role, account: old });
    let grants = roles.iter().map(|&role| RoleOp::Grant { role, account: new });
    revokes.chain(grants).collect()
}

/// Roles that would be left without any holder partway through `ops`.
///
/// Reports the first step (1-based) after which each affected role is empty.
/// Roles that were already empty before the transition are not reported.
pub fn transition_gaps(table: &RoleTable, ops: &[RoleOp]) -> Vec<RoleError> {
    let mut sim = table.clone();
    let mut reported = BTreeSet::new();
    let mut gaps = Vec::new();

    for (i, op) in ops.iter().enumerate() {
        sim.apply(op);
        let role = op.role();
        if sim.holder_count(role) == 0 && table.holder_count(role) > 0 && reported.insert(role) {
            gaps.push(RoleError::TransientAuthorityGap { role, step: i + 1 });
        }
    }
    gaps
}

/// Replay `ops` against a timelock, one call per step.
///
/// Stops at the first refused step. Steps already applied stay applied, so an
/// interruption can leave a role without a holder until someone follows up
/// manually.
pub fn execute_transition<T: Timelock + ?Sized>(
    timelock: &mut T,
    caller: Address,
    ops: &[RoleOp],
) -> Result<usize, RoleError> {
    for (applied, op) in ops.iter().enumerate() {
        let result = match *op {
            RoleOp::Grant { role, account } => timelock.grant_role(caller, role, account),
            RoleOp::Revoke { role, account } => timelock.revoke_role(caller, role, account),
        };

        if let Err(reason) = result {
            warn!(applied, total = ops.len(), %op, error = %reason, "Authority transition interrupted");
            return Err(RoleError::TransitionInterrupted {
                applied,
                total: ops.len(),
                reason,
            });
        }
        info!(step = applied + 1, %op, "Applied role operation");
    }
    Ok(ops.len())
}

/// Holders per role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleTable {
    holders: BTreeMap<Role, BTreeSet<Address>>,
}

impl RoleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table whose only entry is `admin` holding [`Role::Admin`].
    pub fn with_admin(admin: Address) -> Self {
        let mut table = Self::new();
        table.grant(Role::Admin, admin);
        table
    }

    /// Assign `role` to `account`; returns whether anything changed.
    pub fn grant(&mut self, role: Role, account: Address) -> bool {
        self.holders.entry(role).or_default().insert(account)
    }

    /// Unassign `role` from `account`; returns whether anything changed.
    pub fn revoke(&mut self, role: Role, account: Address) -> bool {
        match self.holders.get_mut(&role) {
            Some(set) => set.remove(&account),
            None => false,
        }
    }

    pub fn has_role(&self, role: Role, account: &Address) -> bool {
        self.holders
            .get(&role)
            .map(|set| set.contains(account))
            .unwrap_or(false)
    }

    pub fn holders(&self, role: Role) -> Vec<Address> {
        self.holders
            .get(&role)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn holder_count(&self, role: Role) -> usize {
        self.holders.get(&role).map(BTreeSet::len).unwrap_or(0)
    }

    /// All `(role, holder)` pairs in role order.
    pub fn assignments(&self) -> impl Iterator<Item = (Role, Address)> + '_ {
        self.holders
            .iter()
            .flat_map(|(role, set)| set.iter().map(move |addr| (*role, *addr)))
    }

    pub fn apply(&mut self, op: &RoleOp) -> bool {
        match *op {
            RoleOp::Grant { role, account } => self.grant(role, account),
            RoleOp::Revoke { role, account } => self.revoke(role, account),
        }
    }

    /// Apply ops in order; returns how many changed something.
    pub fn apply_sequence(&mut self, ops: &[RoleOp]) -> usize {
        ops.iter().filter(|op| self.apply(op)).count()
    }

    /// Apply ops as one step: either all take effect or, if the result would
    /// leave [`Role::Admin`] without a holder, none do.
    pub fn apply_atomic(&mut self, ops: &[RoleOp]) -> Result<usize, RoleError> {
        let mut next = self.clone();
        let changed = next.apply_sequence(ops);
        if next.holder_count(Role::Admin) == 0 {
            return Err(RoleError::AdminLockout);
        }
        *self = next;
        Ok(changed)
    }
}
