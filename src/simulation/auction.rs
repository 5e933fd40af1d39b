//! Relay auction run by a node that needs coverage.
//!
//! The initiator broadcasts one `RelayOffer` per waypoint, buffers the bids
//! addressed to it while the bid window is open, and on close assigns each
//! waypoint to its cheapest bidder. A waypoint nobody bid for stays unfilled
//! and is reported back in [`AuctionOutcome::unfilled`]; no retry is made.

use log::debug;

use super::graph::NodeId;
use super::message::{Message, RelayBid};
use super::timer::TimerHandle;
use super::types::AgentAddress;

/// Length of the bid window in simulated seconds.
pub const BID_WINDOW_SECONDS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq)]
pub enum AuctionState {
    Idle,
    CollectingBids { waypoints: Vec<NodeId>, timer: TimerHandle },
}

/// Result of a closed bid window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuctionOutcome {
    /// Winning bid per waypoint, in request order.
    pub assignments: Vec<RelayBid>,
    /// Waypoints that received no bid.
    pub unfilled: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct RelayAuction {
    state: AuctionState,
    bids: Vec<RelayBid>,
}

impl Default for RelayAuction {
    fn default() -> Self {
        Self {
            state: AuctionState::Idle,
            bids: Vec::new(),
        }
    }
}

impl RelayAuction {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &AuctionState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == AuctionState::Idle
    }

    pub fn bids(&self) -> &[RelayBid] {
        &self.bids
    }

    /// Start collecting bids and return the offers to broadcast.
    ///
    /// An auction that is already open is left untouched and no offers are
    /// produced.
    pub fn open(&mut self, owner: AgentAddress, waypoints: Vec<NodeId>, timer: TimerHandle) -> Vec<Message> {
        if !self.is_idle() {
            return Vec::new();
        }
        let offers = waypoints.iter().map(|&waypoint| Message::relay_offer(owner, waypoint)).collect();
        self.bids.clear();
        self.state = AuctionState::CollectingBids { waypoints, timer };
        offers
    }

    /// Buffer a bid. Ignored unless bids are being collected, the waypoint
    /// was requested and the bidder has not bid on it yet.
    pub fn record_bid(&mut self, bid: RelayBid) -> bool {
        let AuctionState::CollectingBids { waypoints, .. } = &self.state else {
            return false;
        };
        if !waypoints.contains(&bid.waypoint) {
            return false;
        }
        if self.bids.iter().any(|b| b.bidder == bid.bidder && b.waypoint == bid.waypoint) {
            return false;
        }
        self.bids.push(bid);
        true
    }

    /// Close the window opened with `timer` and pick a winner per waypoint.
    ///
    /// Returns `None` if no auction is open or `timer` belongs to another one.
    /// The first of several equally cheap bids wins.
    pub fn close(&mut self, timer: TimerHandle) -> Option<AuctionOutcome> {
        match &self.state {
            AuctionState::CollectingBids { timer: open, .. } if *open == timer => {}
            _ => return None,
        }
        let AuctionState::CollectingBids { waypoints, .. } = std::mem::replace(&mut self.state, AuctionState::Idle) else {
            return None;
        };
        let bids = std::mem::take(&mut self.bids);

        let mut outcome = AuctionOutcome::default();
        for waypoint in waypoints {
            let mut best: Option<&RelayBid> = None;
            for bid in bids.iter().filter(|b| b.waypoint == waypoint) {
                if best.is_none_or(|b| bid.cost < b.cost) {
                    best = Some(bid);
                }
            }
            match best {
                Some(bid) => outcome.assignments.push(*bid),
                None => outcome.unfilled.push(waypoint),
            }
        }
        debug!("Auction closed: {} assigned, {} unfilled", outcome.assignments.len(), outcome.unfilled.len());
        Some(outcome)
    }
}
