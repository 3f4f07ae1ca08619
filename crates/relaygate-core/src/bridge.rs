//! Bridge transports and the home-side command relay.
//!
//! The relay encodes a batch, addresses it to the mediator registered for the
//! destination chain and hands it to that chain's transport. Delivery is
//! asynchronous: the relay records what it sent and returns immediately.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use relaygate_codec::encode;
use relaygate_types::{Address, Batch, ChainId, Hash};
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::registry::MediatorRegistry;

/// Family of bridge a transport talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeKind {
    /// Canonical messenger of an optimistic or zk rollup
    NativeRollup,
    /// Checkpointed state sync of a sidechain
    SidechainCheckpoint,
    /// Third-party message relayer network
    MessageRelayer,
}

impl fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeKind::NativeRollup => write!(f, "native-rollup"),
            BridgeKind::SidechainCheckpoint => write!(f, "sidechain-checkpoint"),
            BridgeKind::MessageRelayer => write!(f, "message-relayer"),
        }
    }
}

/// One cross-chain message as sent and as delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeMessage {
    pub source_chain: ChainId,
    pub sender: Address,
    pub destination_chain: ChainId,
    pub destination: Address,
    pub nonce: u64,
    /// Encoded batch
    pub data: Vec<u8>,
}

impl BridgeMessage {
    /// Stable identifier used for replay protection.
    pub fn id(&self) -> Hash {
        Hash::compute_multi(&[
            &self.source_chain.to_be_bytes()[..],
            &self.sender.as_bytes()[..],
            &self.destination_chain.to_be_bytes()[..],
            &self.destination.as_bytes()[..],
            &self.nonce.to_be_bytes()[..],
            self.data.as_slice(),
        ])
    }
}

/// Acknowledgement that a transport accepted a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub kind: BridgeKind,
    pub message_id: Hash,
    /// Position in the transport's own queue
    pub sequence: u64,
}

/// Outbound side of a bridge.
pub trait BridgeTransport: Send {
    fn kind(&self) -> BridgeKind;

    /// Accept `message` for delivery. Returning `Ok` means accepted, not
    /// delivered.
    fn send(&mut self, message: &BridgeMessage) -> Result<DeliveryReceipt, BridgeError>;
}

#[derive(Debug, Default)]
struct Queue {
    messages: VecDeque<BridgeMessage>,
    sent: u64,
    closed: bool,
}

/// In-memory transport that queues messages until they are taken from its
/// [`Mailbox`].
#[derive(Debug)]
pub struct QueuedBridge {
    kind: BridgeKind,
    queue: Arc<Mutex<Queue>>,
}

/// Receiving end of a [`QueuedBridge`].
#[derive(Debug, Clone)]
pub struct Mailbox {
    queue: Arc<Mutex<Queue>>,
}

impl QueuedBridge {
    pub fn new(kind: BridgeKind) -> (Self, Mailbox) {
        let queue = Arc::new(Mutex::new(Queue::default()));
        let mailbox = Mailbox {
            queue: Arc::clone(&queue),
        };
        (Self { kind, queue }, mailbox)
    }
}

impl BridgeTransport for QueuedBridge {
    fn kind(&self) -> BridgeKind {
        self.kind
    }

    fn send(&mut self, message: &BridgeMessage) -> Result<DeliveryReceipt, BridgeError> {
        let mut queue = self.queue.lock();
        if queue.closed {
            return Err(BridgeError::Rejected(format!("{} bridge is closed", self.kind)));
        }

        let sequence = queue.sent;
        queue.sent += 1;
        queue.messages.push_back(message.clone());
        Ok(DeliveryReceipt {
            kind: self.kind,
            message_id: message.id(),
            sequence,
        })
    }
}

impl Mailbox {
    /// Take the oldest undelivered message.
    pub fn pop(&self) -> Option<BridgeMessage> {
        self.queue.lock().messages.pop_front()
    }

    pub fn drain(&self) -> Vec<BridgeMessage> {
        self.queue.lock().messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Refuse all further sends on the paired bridge.
    pub fn close(&self) {
        self.queue.lock().closed = true;
    }
}

/// Record of a message accepted by a transport. Can be sent again verbatim
/// with [`CommandRelay::replay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendEvent {
    pub message: BridgeMessage,
    pub receipt: DeliveryReceipt,
}

/// Home-side sender of command batches.
pub struct CommandRelay {
    chain_id: ChainId,
    address: Address,
    transports: BTreeMap<ChainId, Box<dyn BridgeTransport>>,
    outbox: Vec<SendEvent>,
    next_nonce: u64,
}

impl CommandRelay {
    /// Relay sending from `address` on `chain_id`.
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self {
            chain_id,
            address,
            transports: BTreeMap::new(),
            outbox: Vec::new(),
            next_nonce: 0,
        }
    }

    /// Relay that continues numbering at `next_nonce`.
    ///
    /// A restarted relay must resume from the nonce it had reached. Starting
    /// again at 0 would give a repeated batch the id of an earlier message,
    /// and the receiver would drop it as a duplicate.
    pub fn with_next_nonce(chain_id: ChainId, address: Address, next_nonce: u64) -> Self {
        Self {
            next_nonce,
            ..Self::new(chain_id, address)
        }
    }

    /// Nonce the next relayed message will carry. Persist this across
    /// restarts.
    pub fn next_nonce(&self) -> u64 {
        self.next_nonce
    }

    pub fn chain_id(&self) -> ChainId {
        self.chain_id
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Use `transport` for messages to `chain_id`, replacing any previous one.
    pub fn register_route(&mut self, chain_id: ChainId, transport: Box<dyn BridgeTransport>) {
        info!(chain_id, kind = %transport.kind(), "Bridge route registered");
        self.transports.insert(chain_id, transport);
    }

    pub fn has_route(&self, chain_id: ChainId) -> bool {
        self.transports.contains_key(&chain_id)
    }

    /// Encode `batch` and send it to the mediator of `chain_id`.
    ///
    /// Nothing is recorded unless the transport accepts the message.
    pub fn relay(
        &mut self,
        mediators: &MediatorRegistry,
        chain_id: ChainId,
        batch: &Batch,
    ) -> Result<&SendEvent, BridgeError> {
        let destination = mediators
            .mediator_of(chain_id)
            .ok_or(BridgeError::NoMediator(chain_id))?;
        let transport = self
            .transports
            .get_mut(&chain_id)
            .ok_or(BridgeError::NoTransport(chain_id))?;

        let message = BridgeMessage {
            source_chain: self.chain_id,
            sender: self.address,
            destination_chain: chain_id,
            destination,
            nonce: self.next_nonce,
            data: encode(batch)?,
        };

        let receipt = match transport.send(&message) {
            Ok(receipt) => receipt,
            Err(err) => {
                warn!(chain_id, nonce = message.nonce, error = %err, "Bridge refused batch");
                return Err(err);
            }
        };
        self.next_nonce += 1;

        info!(
            chain_id,
            %destination,
            nonce = message.nonce,
            id = %receipt.message_id,
            calls = batch.len(),
            "Batch relayed"
        );
        self.outbox.push(SendEvent { message, receipt });
        Ok(&self.outbox[self.outbox.len() - 1])
    }

    /// Every message accepted so far, oldest first.
    pub fn outbox(&self) -> &[SendEvent] {
        &self.outbox
    }

    /// Send a previously relayed message again, unchanged.
    pub fn replay(&mut self, nonce: u64) -> Result<DeliveryReceipt, BridgeError> {
        let event = self
            .outbox
            .iter()
            .find(|event| event.message.nonce == nonce)
            .ok_or(BridgeError::UnknownMessage(nonce))?;
        let chain_id = event.message.destination_chain;
        let transport = self
            .transports
            .get_mut(&chain_id)
            .ok_or(BridgeError::NoTransport(chain_id))?;

        debug!(chain_id, nonce, "Replaying message");
        transport.send(&event.message)
    }
}

impl fmt::Debug for CommandRelay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRelay")
            .field("chain_id", &self.chain_id)
            .field("address", &self.address)
            .field("routes", &self.transports.keys().collect::<Vec<_>>())
            .field("outbox", &self.outbox.len())
            .finish()
    }
}
