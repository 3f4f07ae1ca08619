//! Timelock capability roles.

use crate::error::TypesError;
use crate::hash::keccak256;
use std::fmt;
use std::str::FromStr;

/// Capability category on the timelock.
///
/// Ordering follows declaration order and is the order in which role
/// operations are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    /// May grant and revoke every role
    Admin,
    /// May schedule operations
    Proposer,
    /// May execute ready operations
    Executor,
    /// May cancel pending operations
    Canceller,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Proposer, Role::Executor, Role::Canceller];

    /// Name hashed into the role identifier.
    pub fn name(&self) -> &'static str {
        match self {
            Role::Admin => "TIMELOCK_ADMIN_ROLE",
            Role::Proposer => "PROPOSER_ROLE",
            Role::Executor => "EXECUTOR_ROLE",
            Role::Canceller => "CANCELLER_ROLE",
        }
    }

    /// Well-known 32-byte role identifier: `keccak256(name)`.
    pub fn id(&self) -> [u8; 32] {
        keccak256(self.name().as_bytes())
    }

    /// Look up a role from its 32-byte identifier.
    pub fn from_id(id: &[u8; 32]) -> Option<Role> {
        Self::ALL.into_iter().find(|role| &role.id() == id)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Admin => "admin",
            Role::Proposer => "proposer",
            Role::Executor => "executor",
            Role::Canceller => "canceller",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" | "timelock_admin_role" => Ok(Role::Admin),
            "proposer" | "proposer_role" => Ok(Role::Proposer),
            "executor" | "executor_role" => Ok(Role::Executor),
            "canceller" | "canceler" | "canceller_role" => Ok(Role::Canceller),
            _ => Err(TypesError::UnknownRole(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ids_are_distinct() {
        let ids: Vec<_> = Role::ALL.iter().map(Role::id).collect();
        for (i, a) in ids.iter().enumerate() {
            for b in &ids[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_proposer_role_id() {
        assert_eq!(
            hex::encode(Role::Proposer.id()),
            "b09aa5aeb3702cfd50b6b62bc4532604938f21248a27a1d5ca736082b6819cc1"
        );
    }

    #[test]
    fn test_role_from_id() {
        for role in Role::ALL {
            assert_eq!(Role::from_id(&role.id()), Some(role));
        }
        assert_eq!(Role::from_id(&[0u8; 32]), None);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("canceler".parse::<Role>().unwrap(), Role::Canceller);
        assert!("owner".parse::<Role>().is_err());
        assert_eq!(Role::Executor.to_string(), "executor");
    }
}
