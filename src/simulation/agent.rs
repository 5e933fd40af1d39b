//! Mobile node (AGV) behaviour.
//!
//! Each tick a [`NodeAgent`]:
//! 1. Works on the task at the head of its queue (drive, wait, complete)
//! 2. Emits a status report and a knowledge snapshot every feedback interval
//! 3. Records its current connectivity in its knowledge base
//! 4. In adaptive ad-hoc mode, requests relay assistance after staying
//!    disconnected for too long
//!
//! Connectivity is inferred from the application-level acknowledge flow: a
//! node counts itself connected while fewer than three status reports are
//! unacknowledged.
//!
//! Agents never touch each other directly. Outgoing messages go to the
//! outbox in [`AgentContext`] and are broadcast by the simulation from the
//! agent's position.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, trace, warn};
use rand::Rng;
use rand::rngs::StdRng;

use super::auction::{BID_WINDOW_SECONDS, RelayAuction};
use super::graph::{NavigationGraph, NodeId};
use super::knowledge::ConnectivityKnowledgeBase;
use super::message::{AgentState, Message, MessageKind, RelayBid, SharedMessage, StatusReport, TaskOrder};
use super::relay_planner::RelayPlanner;
use super::timer::{TimerEvent, TimerHandle, TimerQueue};
use super::types::{AgentAddress, Point, Recipient};

/// Unacknowledged status reports after which a node counts as disconnected.
const DISCONNECT_THRESHOLD: u32 = 3;

/// Tunables shared by every agent of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentSettings {
    /// Travel speed in world units per second.
    pub speed: f64,
    pub destination_tolerance: f64,
    pub feedback_interval: f64,
    pub assist_request_timeout: f64,
    pub connection_probability_threshold: f64,
    /// Wait time carried by relay tasks.
    pub relay_wait_seconds: f64,
    pub bid_window_seconds: f64,
    /// Forward messages not addressed to this node.
    pub ad_hoc: bool,
    /// Request relay assistance when connectivity is at risk.
    pub adaptive: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            speed: 1.0,
            destination_tolerance: 0.1,
            feedback_interval: 3.0,
            assist_request_timeout: 60.0,
            connection_probability_threshold: 0.85,
            relay_wait_seconds: 60.0,
            bid_window_seconds: BID_WINDOW_SECONDS,
            ad_hoc: true,
            adaptive: true,
        }
    }
}

/// Everything an agent may use during one step, borrowed from the world.
pub struct AgentContext<'a> {
    pub graph: &'a NavigationGraph,
    pub planner: &'a RelayPlanner,
    /// Positions of the working access points.
    pub access_points: &'a [Point],
    pub timers: &'a mut TimerQueue,
    pub outbox: &'a mut Vec<SharedMessage>,
    pub rng: &'a mut StdRng,
    pub now_ms: u64,
}

impl AgentContext<'_> {
    fn send(&mut self, message: Message) {
        self.outbox.push(message.into_shared());
    }
}

#[derive(Debug)]
pub struct NodeAgent {
    address: AgentAddress,
    /// Position in the simulation's agent roster, used to route timer events back.
    roster_index: usize,
    position: Point,
    state: AgentState,
    is_connected: bool,
    tasks: VecDeque<TaskOrder>,
    route: VecDeque<Point>,
    settings: AgentSettings,
    knowledge: ConnectivityKnowledgeBase,
    auction: RelayAuction,
    unacknowledged_status: u32,
    time_till_feedback: f64,
    time_till_assist_request: f64,
    completed_since_report: u32,
    completed_total: u64,
    unfilled_waypoints: u64,
}

impl NodeAgent {
    /// Create an idle agent. The first feedback fires after a random phase
    /// within one feedback interval so reports do not all collide.
    pub fn new(address: AgentAddress, roster_index: usize, position: Point, settings: AgentSettings, rng: &mut StdRng) -> Self {
        let time_till_feedback = if settings.feedback_interval > 0.0 { rng.gen_range(0.0..settings.feedback_interval) } else { 0.0 };
        Self {
            address,
            roster_index,
            position,
            state: AgentState::Idle,
            is_connected: true,
            tasks: VecDeque::new(),
            route: VecDeque::new(),
            time_till_assist_request: settings.assist_request_timeout,
            time_till_feedback,
            settings,
            knowledge: ConnectivityKnowledgeBase::new(),
            auction: RelayAuction::new(),
            unacknowledged_status: 0,
            completed_since_report: 0,
            completed_total: 0,
            unfilled_waypoints: 0,
        }
    }

    pub fn initialize_knowledge(&mut self, graph: &NavigationGraph) {
        self.knowledge.initialize(graph);
    }

    pub fn address(&self) -> AgentAddress {
        self.address
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskOrder> {
        self.tasks.iter()
    }

    pub fn knowledge(&self) -> &ConnectivityKnowledgeBase {
        &self.knowledge
    }

    pub fn auction(&self) -> &RelayAuction {
        &self.auction
    }

    /// Non-relay tasks finished since the agent was created.
    pub fn completed_total(&self) -> u64 {
        self.completed_total
    }

    /// Relay waypoints left without a bidder across all auctions.
    pub fn unfilled_waypoints(&self) -> u64 {
        self.unfilled_waypoints
    }

    /// Advance the agent by `dt` seconds.
    pub fn update(&mut self, dt: f64, ctx: &mut AgentContext) {
        self.fulfill_task(dt, ctx);

        self.time_till_feedback -= dt;
        if self.time_till_feedback < 0.0 {
            self.time_till_feedback = self.settings.feedback_interval;
            self.send_feedback(ctx);
            self.send_exchange(ctx);
        }

        self.is_connected = self.unacknowledged_status < DISCONNECT_THRESHOLD;
        self.knowledge.register(&self.position, self.is_connected);
        self.request_assistance(dt, ctx);
    }

    fn fulfill_task(&mut self, dt: f64, ctx: &mut AgentContext) {
        let Some(head) = self.tasks.front_mut() else {
            self.state = AgentState::Idle;
            return;
        };
        let Some(destination) = ctx.graph.position(head.destination) else {
            warn!("Agent {}: task destination {} no longer exists, dropping task", self.address, head.destination);
            self.tasks.pop_front();
            self.route.clear();
            return;
        };

        if self.position.distance(&destination) < self.settings.destination_tolerance {
            if head.wait_time > 0.0 {
                head.wait_time -= dt;
                self.state = AgentState::Waiting;
            } else {
                let was_relay = head.is_relay_task;
                self.tasks.pop_front();
                self.route.clear();
                if !was_relay {
                    self.completed_since_report += 1;
                    self.completed_total += 1;
                }
                self.state = if self.tasks.is_empty() { AgentState::Idle } else { AgentState::Driving };
            }
        } else {
            self.state = AgentState::Driving;
            self.drive(dt, ctx);
        }
    }

    fn drive(&mut self, dt: f64, ctx: &mut AgentContext) {
        if let Some(next) = self.route.front() {
            if self.position.distance(next) < self.settings.destination_tolerance {
                self.route.pop_front();
            } else {
                self.position = self.position.step_towards(next, self.settings.speed * dt);
            }
            return;
        }

        let Some(destination) = self.tasks.front().map(|t| t.destination) else {
            return;
        };
        if !self.set_route(destination, ctx.graph) {
            return;
        }

        if self.settings.adaptive && self.settings.ad_hoc {
            let target = ctx.graph.position(destination).unwrap_or(self.position);
            let probability = self.knowledge.probability(&target);
            if probability < self.settings.connection_probability_threshold {
                debug!("Agent {}: destination {} connection probability {:.2}, requesting relays", self.address, destination, probability);
                self.determine_assistance(destination, ctx);
            }
        }
    }

    /// Plan a route from the nearest graph node. An unreachable task is dropped.
    fn set_route(&mut self, destination: NodeId, graph: &NavigationGraph) -> bool {
        let path = graph
            .nearest_node(&self.position)
            .ok_or_else(|| "graph is empty".to_string())
            .and_then(|start| graph.shortest_path(start, destination).map_err(|e| e.to_string()));

        match path {
            Ok(path) => {
                self.route = path.into_iter().filter_map(|id| graph.position(id)).collect();
                true
            }
            Err(e) => {
                warn!("Agent {}: dropping task to {}: {}", self.address, destination, e);
                self.tasks.pop_front();
                self.route.clear();
                false
            }
        }
    }

    fn send_feedback(&mut self, ctx: &mut AgentContext) {
        ctx.send(Message::status(StatusReport {
            state: self.state,
            sender: self.address,
            position: self.position,
            is_connected: self.is_connected,
            completed_tasks: self.completed_since_report,
        }));
        self.completed_since_report = 0;
        self.unacknowledged_status += 1;
    }

    fn send_exchange(&mut self, ctx: &mut AgentContext) {
        if let Some(cell) = self.knowledge.sample_for_exchange(ctx.rng) {
            ctx.send(Message::knowledge_exchange(cell));
        }
    }

    fn request_assistance(&mut self, dt: f64, ctx: &mut AgentContext) {
        if !self.settings.adaptive || !self.settings.ad_hoc {
            return;
        }

        if self.is_connected {
            self.time_till_assist_request = self.settings.assist_request_timeout;
        }
        self.time_till_assist_request -= dt;

        if self.time_till_assist_request < 0.0 {
            self.time_till_assist_request = self.settings.assist_request_timeout;
            let target = self.tasks.front().map(|t| t.destination).or_else(|| ctx.graph.nearest_node(&self.position));
            if let Some(target) = target {
                info!("Agent {}: disconnected for {}s, requesting relays towards {}", self.address, self.settings.assist_request_timeout, target);
                self.determine_assistance(target, ctx);
            }
        }
    }

    /// Plan a relay chain towards `destination` and open an auction for it.
    fn determine_assistance(&mut self, destination: NodeId, ctx: &mut AgentContext) {
        if !self.auction.is_idle() {
            debug!("Agent {}: auction already open, ignoring relay request", self.address);
            return;
        }

        let route = match ctx.planner.assistance_route(ctx.graph, ctx.access_points, destination) {
            Ok(route) => route,
            Err(e) => {
                debug!("Agent {}: no relay chain towards {}: {}", self.address, destination, e);
                return;
            }
        };
        if route.is_empty() {
            return;
        }

        let due = ctx.now_ms + (self.settings.bid_window_seconds * 1000.0).round() as u64;
        let handle = ctx.timers.schedule(due, TimerEvent::CloseBidWindow { agent: self.roster_index });
        let offers = self.auction.open(self.address, route, handle);
        debug!("Agent {}: offering {} relay positions", self.address, offers.len());
        for offer in offers {
            ctx.send(offer);
        }
    }

    /// Close the bid window identified by `handle` and dispatch relay tasks.
    pub fn close_bid_window(&mut self, handle: TimerHandle, ctx: &mut AgentContext) {
        let Some(outcome) = self.auction.close(handle) else {
            return;
        };

        for bid in &outcome.assignments {
            debug!("Agent {}: relay position {} goes to agent {} (cost {:.2})", self.address, bid.waypoint, bid.bidder, bid.cost);
            ctx.send(Message::task(
                bid.bidder,
                TaskOrder {
                    destination: bid.waypoint,
                    wait_time: self.settings.relay_wait_seconds,
                    is_relay_task: true,
                },
            ));
        }

        if !outcome.unfilled.is_empty() {
            warn!("Agent {}: {} relay position(s) received no bids", self.address, outcome.unfilled.len());
            self.unfilled_waypoints += outcome.unfilled.len() as u64;
        }
    }

    /// Inbound handler for a message delivered by the medium.
    ///
    /// Messages for this node are handled, broadcasts are handled and
    /// forwarded, everything else is only forwarded.
    pub fn receive(&mut self, message: &SharedMessage, ctx: &mut AgentContext) {
        if message.is_for(self.address) {
            self.handle(message, ctx);
        }
        if message.recipient != Recipient::Node(self.address) {
            self.route_message(message, ctx);
        }
    }

    fn route_message(&self, message: &SharedMessage, ctx: &mut AgentContext) {
        if !self.settings.ad_hoc {
            return;
        }
        if message.relay_check() {
            ctx.outbox.push(Rc::clone(message));
        } else {
            trace!("Agent {}: {} message out of hops after {} relay checks", self.address, message.kind.name(), message.relay_count());
        }
    }

    fn handle(&mut self, message: &Message, ctx: &mut AgentContext) {
        match &message.kind {
            MessageKind::Task(order) => self.handle_task(*order),
            MessageKind::Acknowledge => self.unacknowledged_status = 0,
            MessageKind::KnowledgeExchange(cell) => self.knowledge.incorporate(cell),
            MessageKind::RelayOffer { sender, waypoint } => self.handle_relay_offer(*sender, *waypoint, ctx),
            MessageKind::RelayBid(bid) => {
                if message.recipient == Recipient::Node(self.address) {
                    self.auction.record_bid(*bid);
                }
            }
            MessageKind::Status(_) | MessageKind::Standard => {}
        }
    }

    /// Queue a task unless its destination is already queued. A relay task
    /// waiting at the head of the queue is abandoned for it.
    fn handle_task(&mut self, order: TaskOrder) {
        if self.tasks.iter().any(|t| t.destination == order.destination) {
            return;
        }
        if self.tasks.front().is_some_and(|t| t.is_relay_task) {
            self.tasks.pop_front();
            self.route.clear();
        }
        debug!("Agent {}: new {}task to {}", self.address, if order.is_relay_task { "relay " } else { "" }, order.destination);
        self.tasks.push_back(order);
    }

    fn handle_relay_offer(&mut self, sender: AgentAddress, waypoint: NodeId, ctx: &mut AgentContext) {
        if sender == self.address || self.state != AgentState::Idle {
            return;
        }
        let Some(target) = ctx.graph.position(waypoint) else {
            return;
        };
        ctx.send(Message::relay_bid(
            sender,
            RelayBid {
                bidder: self.address,
                waypoint,
                cost: self.position.distance(&target),
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::graph::NodeKind;
    use crate::simulation::transmission::MAX_RANGE;
    use rand::SeedableRng;

    struct Fixture {
        graph: NavigationGraph,
        planner: RelayPlanner,
        access_points: Vec<Point>,
        timers: TimerQueue,
        outbox: Vec<SharedMessage>,
        rng: StdRng,
        now_ms: u64,
        nodes: Vec<NodeId>,
    }

    impl Fixture {
        /// Line of nodes every 20 units: task, parking, parking, task.
        fn new() -> Self {
            let mut graph = NavigationGraph::new();
            let kinds = [NodeKind::Task, NodeKind::Parking, NodeKind::Parking, NodeKind::Task];
            let nodes: Vec<NodeId> = kinds.iter().enumerate().map(|(i, &k)| graph.add_node(Point::planar(i as f64 * 20.0, 0.0), k)).collect();
            for pair in nodes.windows(2) {
                graph.connect(pair[0], pair[1], false, None).unwrap();
            }
            let planner = RelayPlanner::from_graph(&graph, MAX_RANGE, 1.0);
            Self {
                graph,
                planner,
                access_points: vec![Point::planar(-10.0, 0.0)],
                timers: TimerQueue::new(),
                outbox: Vec::new(),
                rng: StdRng::seed_from_u64(3),
                now_ms: 0,
                nodes,
            }
        }

        fn ctx(&mut self) -> AgentContext<'_> {
            AgentContext {
                graph: &self.graph,
                planner: &self.planner,
                access_points: &self.access_points,
                timers: &mut self.timers,
                outbox: &mut self.outbox,
                rng: &mut self.rng,
                now_ms: self.now_ms,
            }
        }

        fn agent(&mut self, address: AgentAddress, position: Point, settings: AgentSettings) -> NodeAgent {
            let mut agent = NodeAgent::new(address, 0, position, settings, &mut self.rng);
            agent.time_till_feedback = 1_000.0;
            agent.initialize_knowledge(&self.graph);
            agent
        }

        fn kinds(&self) -> Vec<&'static str> {
            self.outbox.iter().map(|m| m.kind.name()).collect()
        }
    }

    fn passive() -> AgentSettings {
        AgentSettings {
            adaptive: false,
            ad_hoc: false,
            speed: 10.0,
            ..AgentSettings::default()
        }
    }

    fn task(destination: NodeId, wait_time: f64, is_relay_task: bool) -> SharedMessage {
        Message::task(
            1,
            TaskOrder {
                destination,
                wait_time,
                is_relay_task,
            },
        )
        .into_shared()
    }

    #[test]
    fn drives_waits_and_completes_a_task() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        let dest = fx.nodes[1];
        agent.receive(&task(dest, 1.5, false), &mut fx.ctx());
        assert_eq!(agent.state(), AgentState::Idle);

        let mut states = Vec::new();
        for _ in 0..12 {
            agent.update(1.0, &mut fx.ctx());
            states.push(agent.state());
        }
        assert!(states.contains(&AgentState::Driving));
        assert!(states.contains(&AgentState::Waiting));
        assert_eq!(agent.state(), AgentState::Idle);
        assert_eq!(agent.position(), Point::planar(20.0, 0.0));
        assert_eq!(agent.completed_total(), 1);
        assert_eq!(agent.tasks().count(), 0);
    }

    #[test]
    fn relay_tasks_are_not_counted_as_completed() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        agent.receive(&task(fx.nodes[0], 0.0, true), &mut fx.ctx());
        agent.update(1.0, &mut fx.ctx());
        agent.update(1.0, &mut fx.ctx());
        assert_eq!(agent.tasks().count(), 0);
        assert_eq!(agent.completed_total(), 0);
    }

    #[test]
    fn duplicate_destinations_are_ignored() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        agent.receive(&task(fx.nodes[2], 10.0, false), &mut fx.ctx());
        agent.receive(&task(fx.nodes[2], 30.0, false), &mut fx.ctx());
        agent.receive(&task(fx.nodes[3], 30.0, false), &mut fx.ctx());
        let waits: Vec<f64> = agent.tasks().map(|t| t.wait_time).collect();
        assert_eq!(waits, vec![10.0, 30.0]);
    }

    #[test]
    fn relay_task_at_head_is_preempted_but_normal_task_is_not() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        agent.receive(&task(fx.nodes[1], 60.0, true), &mut fx.ctx());
        agent.receive(&task(fx.nodes[2], 60.0, true), &mut fx.ctx());
        let queued: Vec<NodeId> = agent.tasks().map(|t| t.destination).collect();
        assert_eq!(queued, vec![fx.nodes[2]]);

        agent.receive(&task(fx.nodes[3], 5.0, false), &mut fx.ctx());
        agent.receive(&task(fx.nodes[1], 60.0, true), &mut fx.ctx());
        let queued: Vec<NodeId> = agent.tasks().map(|t| t.destination).collect();
        assert_eq!(queued, vec![fx.nodes[3], fx.nodes[1]]);
    }

    #[test]
    fn three_unacknowledged_reports_mean_disconnected() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        for _ in 0..3 {
            agent.time_till_feedback = 0.0;
            agent.update(0.1, &mut fx.ctx());
        }
        assert!(!agent.is_connected());
        assert_eq!(fx.kinds().iter().filter(|k| **k == "status").count(), 3);
        assert_eq!(fx.kinds().iter().filter(|k| **k == "knowledge").count(), 3);

        agent.receive(&Message::acknowledge(1).into_shared(), &mut fx.ctx());
        agent.update(0.1, &mut fx.ctx());
        assert!(agent.is_connected());
    }

    #[test]
    fn status_report_carries_completed_count_once() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), passive());
        agent.receive(&task(fx.nodes[0], 0.0, false), &mut fx.ctx());
        agent.update(0.1, &mut fx.ctx());
        for _ in 0..2 {
            agent.time_till_feedback = 0.0;
            agent.update(0.1, &mut fx.ctx());
        }
        let counts: Vec<u32> = fx
            .outbox
            .iter()
            .filter_map(|m| match &m.kind {
                MessageKind::Status(report) => Some(report.completed_tasks),
                _ => None,
            })
            .collect();
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn only_idle_agents_bid_on_offers() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(1, Point::planar(0.0, 3.0), passive());
        let offer = Message::relay_offer(7, fx.nodes[1]).into_shared();
        agent.receive(&offer, &mut fx.ctx());
        match &fx.outbox[0].kind {
            MessageKind::RelayBid(bid) => {
                assert_eq!(bid.bidder, 1);
                assert_eq!(bid.waypoint, fx.nodes[1]);
                assert!((bid.cost - Point::planar(0.0, 3.0).distance(&Point::planar(20.0, 0.0))).abs() < 1e-9);
            }
            other => panic!("expected a bid, got {:?}", other),
        }
        assert_eq!(fx.outbox[0].recipient, Recipient::Node(7));

        fx.outbox.clear();
        agent.receive(&task(fx.nodes[3], 5.0, false), &mut fx.ctx());
        agent.update(0.1, &mut fx.ctx());
        assert_eq!(agent.state(), AgentState::Driving);
        agent.receive(&Message::relay_offer(7, fx.nodes[1]).into_shared(), &mut fx.ctx());
        assert!(fx.outbox.is_empty());
    }

    #[test]
    fn own_offers_are_not_answered() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(2, Point::planar(0.0, 0.0), passive());
        agent.receive(&Message::relay_offer(2, fx.nodes[1]).into_shared(), &mut fx.ctx());
        assert!(fx.outbox.is_empty());
    }

    #[test]
    fn ad_hoc_nodes_forward_foreign_messages_within_budget() {
        let mut fx = Fixture::new();
        let relay = AgentSettings { ad_hoc: true, ..passive() };
        let mut agent = fx.agent(2, Point::planar(0.0, 0.0), relay);
        let foreign = Message::acknowledge(9).into_shared();
        agent.receive(&foreign, &mut fx.ctx());
        agent.receive(&foreign, &mut fx.ctx());
        agent.receive(&foreign, &mut fx.ctx());
        assert_eq!(fx.outbox.len(), 2);
        assert!(Rc::ptr_eq(&fx.outbox[0], &foreign));
        assert_eq!(agent.unacknowledged_status, 0);
    }

    #[test]
    fn non_relaying_nodes_never_forward() {
        let mut fx = Fixture::new();
        let mut agent = fx.agent(2, Point::planar(0.0, 0.0), passive());
        agent.receive(&Message::acknowledge(9).into_shared(), &mut fx.ctx());
        agent.receive(&Message::standard(Recipient::All).into_shared(), &mut fx.ctx());
        assert!(fx.outbox.is_empty());
    }

    #[test]
    fn risky_destination_opens_an_auction() {
        let mut fx = Fixture::new();
        let settings = AgentSettings { speed: 10.0, ..AgentSettings::default() };
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), settings);
        agent.receive(&task(fx.nodes[3], 5.0, false), &mut fx.ctx());
        agent.update(0.1, &mut fx.ctx());

        assert!(!agent.auction().is_idle());
        assert!(fx.kinds().contains(&"relay-offer"));
        assert_eq!(fx.timers.len(), 1);
        assert!(fx.timers.pop_due(4_999).is_empty());
        assert_eq!(fx.timers.pop_due(5_000).len(), 1);
    }

    #[test]
    fn closing_the_window_assigns_relay_tasks() {
        let mut fx = Fixture::new();
        let settings = AgentSettings { speed: 10.0, ..AgentSettings::default() };
        let mut agent = fx.agent(1, Point::planar(0.0, 0.0), settings);
        agent.receive(&task(fx.nodes[3], 5.0, false), &mut fx.ctx());
        agent.update(0.1, &mut fx.ctx());

        let offered: Vec<NodeId> = fx
            .outbox
            .iter()
            .filter_map(|m| match m.kind {
                MessageKind::RelayOffer { waypoint, .. } => Some(waypoint),
                _ => None,
            })
            .collect();
        assert_eq!(offered.len(), 2);
        let bid = RelayBid {
            bidder: 5,
            waypoint: offered[0],
            cost: 2.0,
        };
        agent.receive(&Message::relay_bid(1, bid).into_shared(), &mut fx.ctx());
        fx.outbox.clear();

        let (handle, _) = fx.timers.pop_due(5_000)[0];
        fx.now_ms = 5_000;
        agent.close_bid_window(handle, &mut fx.ctx());

        assert!(agent.auction().is_idle());
        let task = fx.outbox.iter().find(|m| m.recipient == Recipient::Node(5)).unwrap();
        assert_eq!(
            task.kind,
            MessageKind::Task(TaskOrder {
                destination: offered[0],
                wait_time: 60.0,
                is_relay_task: true,
            })
        );
        assert_eq!(agent.unfilled_waypoints(), offered.len() as u64 - 1);
        // Only the waypoint that drew a bid gets a relay task.
        let tasks = fx.outbox.iter().filter(|m| matches!(m.kind, MessageKind::Task(_))).count();
        assert_eq!(tasks, 1);
    }

    #[test]
    fn long_disconnection_requests_assistance() {
        let mut fx = Fixture::new();
        let settings = AgentSettings {
            assist_request_timeout: 2.0,
            ..AgentSettings::default()
        };
        let mut agent = fx.agent(1, Point::planar(60.0, 0.0), settings);
        agent.unacknowledged_status = DISCONNECT_THRESHOLD;
        for _ in 0..3 {
            agent.update(1.0, &mut fx.ctx());
        }
        assert!(!agent.is_connected());
        assert!(!agent.auction().is_idle());
        assert!(fx.kinds().contains(&"relay-offer"));
    }
}
