use relaygate_codec::CodecError;
use relaygate_types::{Address, ChainId, Hash, Role, Selector};
use thiserror::Error;

/// Errors from the mediator registry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Unknown chain: {0}")]
    UnknownChain(ChainId),

    #[error("Untrusted sender {sender} for chain {chain_id}")]
    UntrustedSender { chain_id: ChainId, sender: Address },

    #[error("Zero address cannot mediate chain {0}")]
    ZeroAddress(ChainId),
}

/// Errors from the selector policy store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolicyError {
    #[error("Malformed policy update: {0}")]
    MalformedUpdate(String),
}

/// Errors from the guard. A guard error never leaves state changed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GuardError {
    #[error("Policy violation at instruction {index}: {target} selector {selector} is not allowed")]
    PolicyViolation {
        index: usize,
        target: Address,
        selector: Selector,
    },

    #[error("Instruction {index} payload has {length} bytes, too short for a selector")]
    PayloadTooShort { index: usize, length: usize },

    #[error("Instruction {index} carries an undecodable bridged payload: {error}")]
    BridgedPayload { index: usize, error: CodecError },

    #[error(
        "Bridged instruction {index}.{inner_index} payload has {length} bytes, too short for a selector"
    )]
    BridgedPayloadTooShort {
        index: usize,
        inner_index: usize,
        length: usize,
    },

    #[error(
        "Bridged policy violation at instruction {index}.{inner_index} on chain {chain_id}: \
         {target} selector {selector} is not allowed"
    )]
    BridgedViolation {
        index: usize,
        inner_index: usize,
        chain_id: ChainId,
        target: Address,
        selector: Selector,
    },

    #[error("Timelock refused forwarded batch: {0}")]
    Timelock(#[from] TimelockError),
}

/// Errors from role bookkeeping and authority transitions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoleError {
    #[error("Role {role} has no holder after step {step}")]
    TransientAuthorityGap { role: Role, step: usize },

    #[error("Transition would leave the admin role without a holder")]
    AdminLockout,

    #[error("Transition interrupted after {applied} of {total} steps: {reason}")]
    TransitionInterrupted {
        applied: usize,
        total: usize,
        reason: TimelockError,
    },
}

/// Errors from the timelock collaborator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimelockError {
    #[error("Account {account} is missing role {role}")]
    MissingRole { account: Address, role: Role },

    #[error("Operation already scheduled: {0}")]
    AlreadyScheduled(Hash),

    #[error("Unknown operation: {0}")]
    UnknownOperation(Hash),

    #[error("Operation {id} not ready: ready at {ready_at}, now {now}")]
    NotReady { id: Hash, ready_at: u64, now: u64 },

    #[error("Operation already executed: {0}")]
    AlreadyExecuted(Hash),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors from bridge transports and the home-side relay.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BridgeError {
    #[error("No transport configured for chain {0}")]
    NoTransport(ChainId),

    #[error("No remote mediator registered for chain {0}")]
    NoMediator(ChainId),

    #[error("Transport rejected message: {0}")]
    Rejected(String),

    #[error("No sent message with nonce {0}")]
    UnknownMessage(u64),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Errors from the remote-side receiver.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ReceiveError {
    #[error("Sender rejected: {0}")]
    Registry(#[from] RegistryError),

    #[error("Undecodable message: {0}")]
    Codec(#[from] CodecError),

    #[error("Instruction {index} failed: {reason}")]
    ExecutionFailed { index: usize, reason: String },
}

/// Crate-level error covering every privileged operation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RelayError {
    #[error("Unauthorized: {caller} does not hold the {role} role")]
    Unauthorized { caller: Address, role: Role },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error(transparent)]
    Role(#[from] RoleError),

    #[error(transparent)]
    Timelock(#[from] TimelockError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error(transparent)]
    Receive(#[from] ReceiveError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}
