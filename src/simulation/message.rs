//! Typed message protocol exchanged over the radio medium.
//!
//! Every transmission is a [`Message`] with a recipient, a kind-specific
//! payload and a relay counter. The counter is interior-mutable and the
//! message travels as [`SharedMessage`], so all receivers of one transmission
//! share a single hop budget.

use std::cell::Cell;
use std::rc::Rc;

use super::graph::NodeId;
use super::knowledge::KnowledgeCell;
use super::types::{AgentAddress, Point, Recipient};

/// Number of transmissions one message may make in total (first send plus relays).
pub const MAX_TRANSMISSIONS: u8 = 3;

/// Mobile node state as reported in status messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Driving,
    Waiting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TaskOrder {
    pub destination: NodeId,
    /// Seconds to wait at the destination.
    pub wait_time: f64,
    pub is_relay_task: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusReport {
    pub state: AgentState,
    pub sender: AgentAddress,
    pub position: Point,
    pub is_connected: bool,
    /// Tasks finished since the previous report.
    pub completed_tasks: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelayBid {
    pub bidder: AgentAddress,
    pub waypoint: NodeId,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    Standard,
    Task(TaskOrder),
    Status(StatusReport),
    Acknowledge,
    KnowledgeExchange(KnowledgeCell),
    RelayOffer { sender: AgentAddress, waypoint: NodeId },
    RelayBid(RelayBid),
}

impl MessageKind {
    pub fn name(&self) -> &'static str {
        match self {
            MessageKind::Standard => "standard",
            MessageKind::Task(_) => "task",
            MessageKind::Status(_) => "status",
            MessageKind::Acknowledge => "acknowledge",
            MessageKind::KnowledgeExchange(_) => "knowledge",
            MessageKind::RelayOffer { .. } => "relay-offer",
            MessageKind::RelayBid(_) => "relay-bid",
        }
    }
}

#[derive(Debug)]
pub struct Message {
    pub recipient: Recipient,
    pub kind: MessageKind,
    relay_counter: Cell<u8>,
}

pub type SharedMessage = Rc<Message>;

impl Message {
    pub fn new(recipient: Recipient, kind: MessageKind) -> Self {
        Self {
            recipient,
            kind,
            relay_counter: Cell::new(0),
        }
    }

    pub fn standard(recipient: Recipient) -> Self {
        Self::new(recipient, MessageKind::Standard)
    }

    pub fn task(recipient: AgentAddress, order: TaskOrder) -> Self {
        Self::new(Recipient::Node(recipient), MessageKind::Task(order))
    }

    pub fn status(report: StatusReport) -> Self {
        Self::new(Recipient::All, MessageKind::Status(report))
    }

    pub fn acknowledge(recipient: AgentAddress) -> Self {
        Self::new(Recipient::Node(recipient), MessageKind::Acknowledge)
    }

    pub fn knowledge_exchange(cell: KnowledgeCell) -> Self {
        Self::new(Recipient::All, MessageKind::KnowledgeExchange(cell))
    }

    pub fn relay_offer(sender: AgentAddress, waypoint: NodeId) -> Self {
        Self::new(Recipient::All, MessageKind::RelayOffer { sender, waypoint })
    }

    pub fn relay_bid(recipient: AgentAddress, bid: RelayBid) -> Self {
        Self::new(Recipient::Node(recipient), MessageKind::RelayBid(bid))
    }

    pub fn into_shared(self) -> SharedMessage {
        Rc::new(self)
    }

    /// Consume one unit of the hop budget.
    ///
    /// Returns `true` while the incremented counter is below
    /// [`MAX_TRANSMISSIONS`], so exactly two relays succeed per message.
    pub fn relay_check(&self) -> bool {
        let next = self.relay_counter.get().saturating_add(1);
        self.relay_counter.set(next);
        next < MAX_TRANSMISSIONS
    }

    pub fn relay_count(&self) -> u8 {
        self.relay_counter.get()
    }

    /// True if a node with `address` should process this message itself.
    pub fn is_for(&self, address: AgentAddress) -> bool {
        match self.recipient {
            Recipient::All => true,
            Recipient::Node(n) => n == address,
            Recipient::Unaddressed => false,
        }
    }
}
