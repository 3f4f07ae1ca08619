//! Relaygate Core - governance relay logic.
//!
//! - [`registry`]: trusted remote mediator per chain
//! - [`policy`]: default-deny selector allow-list
//! - [`guard`]: all-or-nothing batch review in front of the timelock
//! - [`roles`]: role holders and authority transitions
//! - [`bridge`] / [`receiver`]: sending batches across chains and executing
//!   them on arrival

pub mod error;
pub mod registry;
pub mod policy;
pub mod roles;
pub mod timelock;
pub mod state;
pub mod snapshot;
pub mod guard;
pub mod bridge;
pub mod receiver;

pub use error::{
    BridgeError, GuardError, PolicyError, ReceiveError, RegistryError, RelayError, RoleError,
    TimelockError,
};
pub use registry::MediatorRegistry;
pub use policy::{PolicyChange, PolicyEntry, PolicyKey, PolicyUpdate, SelectorPolicyStore};
pub use roles::{execute_transition, transfer_authority, transition_gaps, RoleOp, RoleTable};
pub use timelock::{operation_id, InMemoryTimelock, OperationState, ScheduledOperation, Timelock};
pub use state::{Governance, GovernanceState};
pub use snapshot::{ReceiverLedger, StateSnapshot};
pub use guard::{ForwardMode, Guard};
pub use bridge::{
    BridgeKind, BridgeMessage, BridgeTransport, CommandRelay, DeliveryReceipt, Mailbox,
    QueuedBridge, SendEvent,
};
pub use receiver::{Executor, ReceiveOutcome, RecordingExecutor, RemoteReceiver};
