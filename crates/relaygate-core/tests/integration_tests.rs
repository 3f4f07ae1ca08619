//! Integration tests for Relaygate
//!
//! End-to-end flows across governance, guard, timelock, relay and receiver.

use std::sync::Arc;

use relaygate_codec::encode;
use relaygate_core::{
    transfer_authority, transition_gaps, BridgeKind, CommandRelay, ForwardMode, Governance,
    GovernanceState, Guard, GuardError, InMemoryTimelock, PolicyEntry, QueuedBridge,
    ReceiveError, ReceiveOutcome, ReceiverLedger, RecordingExecutor, RemoteReceiver, RoleError,
    StateSnapshot, Timelock,
};
use relaygate_types::{Address, Batch, ChainId, Instruction, Role, Selector};
use tempfile::TempDir;

const HOME: ChainId = 1;
const REMOTE: ChainId = 137;

fn home_admin() -> Address {
    Address::repeat_byte(0xa1)
}

fn remote_admin() -> Address {
    Address::repeat_byte(0xa2)
}

fn home_mediator() -> Address {
    Address::repeat_byte(0x10)
}

fn remote_mediator() -> Address {
    Address::repeat_byte(0x20)
}

fn transfer() -> Selector {
    Selector::from_signature("transfer(address,uint256)").unwrap()
}

fn call(target: u8) -> Instruction {
    Instruction::call(Address::repeat_byte(target), transfer(), &[0u8; 64])
}

/// Home governance trusting the remote mediator and the remote side trusting
/// the home relay.
fn two_chains() -> (Governance, Arc<Governance>) {
    let home = Governance::new(home_admin());
    home.set_mediator(home_admin(), REMOTE, remote_mediator()).unwrap();

    let remote = Governance::new(remote_admin());
    remote.set_mediator(remote_admin(), HOME, home_mediator()).unwrap();
    (home, Arc::new(remote))
}

#[test]
fn test_relay_to_remote_execution() {
    let (home, remote) = two_chains();
    let (bridge, mailbox) = QueuedBridge::new(BridgeKind::NativeRollup);
    let mut relay = CommandRelay::new(HOME, home_mediator());
    relay.register_route(REMOTE, Box::new(bridge));
    let mut receiver = RemoteReceiver::new(Arc::clone(&remote), RecordingExecutor::new());

    let batch = Batch::new(vec![call(1), call(2)]).unwrap();
    relay.relay(home.read().mediators(), REMOTE, &batch).unwrap();

    // Nothing happens remotely until the bridge delivers
    assert!(receiver.executor().calls().is_empty());

    let message = mailbox.pop().unwrap();
    let outcome = receiver.on_receive(&message).unwrap();
    assert_eq!(
        outcome,
        ReceiveOutcome::Executed {
            id: message.id(),
            calls: 2
        }
    );
    assert_eq!(receiver.executor().calls(), batch.instructions());

    // Redelivery by the bridge is a no-op
    relay.replay(0).unwrap();
    let again = mailbox.pop().unwrap();
    assert_eq!(receiver.on_receive(&again).unwrap(), ReceiveOutcome::Duplicate(message.id()));
    assert_eq!(receiver.executor().calls().len(), 2);
}

fn executed_targets(receiver: &RemoteReceiver<RecordingExecutor>) -> Vec<Address> {
    receiver.executor().calls().iter().map(|ins| ins.target).collect()
}

#[test]
fn test_redelivery_after_failure_runs_each_call_once() {
    let (home, remote) = two_chains();
    let (bridge, mailbox) = QueuedBridge::new(BridgeKind::NativeRollup);
    let mut relay = CommandRelay::new(HOME, home_mediator());
    relay.register_route(REMOTE, Box::new(bridge));
    let mut receiver = RemoteReceiver::new(
        Arc::clone(&remote),
        RecordingExecutor::failing_on(Address::repeat_byte(2)),
    );

    relay
        .relay(home.read().mediators(), REMOTE, &Batch::new(vec![call(1), call(2), call(3)]).unwrap())
        .unwrap();
    let message = mailbox.pop().unwrap();
    assert!(matches!(
        receiver.on_receive(&message),
        Err(ReceiveError::ExecutionFailed { index: 1, .. })
    ));

    receiver.executor_mut().set_failing_target(None);
    relay.replay(0).unwrap();
    receiver.on_receive(&mailbox.pop().unwrap()).unwrap();
    assert_eq!(
        executed_targets(&receiver),
        vec![Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3)]
    );
}

#[test]
fn test_relay_and_receiver_survive_restart() {
    let (home, remote) = two_chains();
    let dir = TempDir::new().unwrap();
    let ledger_path = dir.path().join("receiver.bin");
    let batch = Batch::single(call(1));

    let (bridge, mailbox) = QueuedBridge::new(BridgeKind::SidechainCheckpoint);
    let mut relay = CommandRelay::new(HOME, home_mediator());
    relay.register_route(REMOTE, Box::new(bridge));
    let mut receiver = RemoteReceiver::new(Arc::clone(&remote), RecordingExecutor::new());

    relay.relay(home.read().mediators(), REMOTE, &batch).unwrap();
    let first = mailbox.pop().unwrap();
    receiver.on_receive(&first).unwrap();
    receiver.ledger().save(&ledger_path).unwrap();
    let saved_nonce = relay.next_nonce();

    // Both sides restart
    let (bridge, mailbox) = QueuedBridge::new(BridgeKind::SidechainCheckpoint);
    let mut relay = CommandRelay::with_next_nonce(HOME, home_mediator(), saved_nonce);
    relay.register_route(REMOTE, Box::new(bridge));
    let mut receiver = RemoteReceiver::restore(
        Arc::clone(&remote),
        RecordingExecutor::new(),
        ReceiverLedger::load(&ledger_path).unwrap(),
    );

    // A late redelivery of the old message stays a no-op
    assert_eq!(receiver.on_receive(&first).unwrap(), ReceiveOutcome::Duplicate(first.id()));

    // The same batch relayed again is a new action and runs
    relay.relay(home.read().mediators(), REMOTE, &batch).unwrap();
    let second = mailbox.pop().unwrap();
    assert_ne!(second.id(), first.id());
    assert!(matches!(
        receiver.on_receive(&second).unwrap(),
        ReceiveOutcome::Executed { calls: 1, .. }
    ));
    assert_eq!(executed_targets(&receiver), vec![Address::repeat_byte(1)]);
}

#[test]
fn test_mediator_rotation_revokes_trust() {
    let (home, remote) = two_chains();
    let (bridge, mailbox) = QueuedBridge::new(BridgeKind::MessageRelayer);
    let mut relay = CommandRelay::new(HOME, home_mediator());
    relay.register_route(REMOTE, Box::new(bridge));
    let mut receiver = RemoteReceiver::new(Arc::clone(&remote), RecordingExecutor::new());

    relay.relay(home.read().mediators(), REMOTE, &Batch::single(call(1))).unwrap();
    let message = mailbox.pop().unwrap();

    // Remote governance rotates the trusted home mediator before delivery
    remote
        .set_mediator(remote_admin(), HOME, Address::repeat_byte(0x11))
        .unwrap();
    assert!(matches!(
        receiver.on_receive(&message),
        Err(ReceiveError::Registry(_))
    ));
    assert!(receiver.executor().calls().is_empty());
}

#[test]
fn test_guard_forwards_to_timelock() {
    let gov = Governance::new(home_admin());
    let operator = Address::repeat_byte(0x60);
    let mut timelock = InMemoryTimelock::new(Address::repeat_byte(0x71), 3600);
    timelock.setup_role(Role::Proposer, operator);
    timelock.setup_role(Role::Executor, operator);
    let guard = Guard::new(operator);

    gov.set_policies(
        home_admin(),
        &[
            PolicyEntry::allow(Address::repeat_byte(1), transfer(), HOME),
            PolicyEntry::allow(Address::repeat_byte(2), transfer(), HOME),
            PolicyEntry::allow(Address::repeat_byte(3), transfer(), HOME),
        ],
    )
    .unwrap();

    let batch = Batch::new(vec![call(1), call(2), call(3)]).unwrap();
    guard
        .review_and_forward(&gov, &mut timelock, &batch, HOME, ForwardMode::Schedule)
        .unwrap();

    // Revoking one entry blocks execution of the same batch
    gov.set_policies(
        home_admin(),
        &[PolicyEntry::deny(Address::repeat_byte(2), transfer(), HOME)],
    )
    .unwrap();
    timelock.advance(3600);
    let err = guard
        .review_and_forward(&gov, &mut timelock, &batch, HOME, ForwardMode::Execute)
        .unwrap_err();
    assert!(matches!(err, GuardError::PolicyViolation { index: 1, .. }));
    assert!(timelock.executed().is_empty());

    gov.set_policies(
        home_admin(),
        &[PolicyEntry::allow(Address::repeat_byte(2), transfer(), HOME)],
    )
    .unwrap();
    guard
        .review_and_forward(&gov, &mut timelock, &batch, HOME, ForwardMode::Execute)
        .unwrap();
    assert_eq!(timelock.executed(), batch.instructions());
}

#[test]
fn test_guard_inspects_bridged_batch() {
    let gov = Governance::new(home_admin());
    let entrypoint = Address::repeat_byte(0xe0);
    let send_selector = Selector::from_signature("relay(bytes)").unwrap();
    gov.set_bridge_route(home_admin(), entrypoint, REMOTE).unwrap();
    gov.set_policies(
        home_admin(),
        &[
            PolicyEntry::allow(entrypoint, send_selector, HOME),
            PolicyEntry::allow(Address::repeat_byte(1), transfer(), REMOTE),
        ],
    )
    .unwrap();

    let guard = Guard::new(Address::repeat_byte(0x60));
    let allowed = Batch::single(call(1));
    let outer = |inner: &Batch| {
        Batch::single(Instruction::call(entrypoint, send_selector, &encode(inner).unwrap()))
    };

    assert!(guard.review(&gov.read(), &outer(&allowed), HOME).is_ok());

    let smuggled = Batch::new(vec![call(1), call(9)]).unwrap();
    assert!(matches!(
        guard.review(&gov.read(), &outer(&smuggled), HOME),
        Err(GuardError::BridgedViolation {
            inner_index: 1,
            chain_id: REMOTE,
            ..
        })
    ));
}

#[test]
fn test_authority_handover_reports_gap() {
    let gov = Governance::new(home_admin());
    let successor = Address::repeat_byte(0xb0);

    let ops = transfer_authority(home_admin(), successor, [Role::Admin]);
    let gaps = transition_gaps(gov.read().roles(), &ops);
    assert_eq!(
        gaps,
        vec![RoleError::TransientAuthorityGap {
            role: Role::Admin,
            step: 1
        }]
    );

    gov.transfer_authority(home_admin(), home_admin(), successor, [Role::Admin])
        .unwrap();
    assert_eq!(gov.read().roles().holders(Role::Admin), vec![successor]);
}

#[test]
fn test_timelock_role_handover() {
    let mut timelock = InMemoryTimelock::new(Address::repeat_byte(0x71), 0);
    let old = Address::repeat_byte(0x0a);
    let new = Address::repeat_byte(0x0b);
    timelock.setup_role(Role::Proposer, old);
    timelock.setup_role(Role::Executor, old);

    let ops = transfer_authority(old, new, [Role::Proposer, Role::Executor]);
    let caller = timelock.address();
    relaygate_core::execute_transition(&mut timelock, caller, &ops).unwrap();

    assert!(timelock.has_role(Role::Proposer, &new));
    assert!(timelock.has_role(Role::Executor, &new));
    assert!(!timelock.has_role(Role::Proposer, &old));
}

#[test]
fn test_state_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.bin");

    let (home, _) = two_chains();
    home.set_policies(
        home_admin(),
        &[PolicyEntry::allow(Address::repeat_byte(1), transfer(), REMOTE)],
    )
    .unwrap();
    home.snapshot().save(&path).unwrap();

    let restored = GovernanceState::from_snapshot(StateSnapshot::load(&path).unwrap()).unwrap();
    let restored = Governance::from_state(restored);
    assert!(restored.is_trusted_sender(REMOTE, &remote_mediator()));
    assert!(restored.is_allowed(&Address::repeat_byte(1), &transfer(), REMOTE));
    assert_eq!(restored.read().policies().history().len(), 1);
}
