//! Stationary access points bridging the radio medium and the dispatcher.

use super::message::Message;
use super::types::{Point, Recipient};

#[derive(Debug, Clone, PartialEq)]
pub struct AccessPoint {
    position: Point,
    working: bool,
}

impl AccessPoint {
    pub fn new(position: Point, working: bool) -> Self {
        Self { position, working }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn is_working(&self) -> bool {
        self.working
    }

    /// True if this access point hands `message` up to the dispatcher.
    ///
    /// Only broadcast and unaddressed messages are accepted, and only while
    /// the access point is working.
    pub fn accepts(&self, message: &Message) -> bool {
        self.working && matches!(message.recipient, Recipient::All | Recipient::Unaddressed)
    }
}
