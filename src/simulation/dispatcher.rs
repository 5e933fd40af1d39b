//! Fleet controller behind the access points.
//!
//! The dispatcher issues transport tasks, acknowledges status reports and
//! evaluates fleet metrics. It only sees the fleet through status messages
//! and through [`AgentView`] snapshots used for choosing task recipients.

use log::debug;
use rand::Rng;
use rand::rngs::StdRng;

use super::graph::{NavigationGraph, NodeId, NodeKind};
use super::message::{AgentState, Message, MessageKind, StatusReport, TaskOrder};
use super::types::{AgentAddress, Point};

/// Minimum seconds between two accepted reports from the same sender.
const FEEDBACK_DEDUPE_SECONDS: f64 = 1.0;

/// A node closer than this to a graph node occupies it.
const OCCUPANCY_RADIUS: f64 = 1.0;

/// Read-only snapshot of an agent, taken once per tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgentView {
    pub address: AgentAddress,
    pub state: AgentState,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatcherSettings {
    /// Seconds between tasks for the whole fleet; divided by the fleet size.
    pub task_interval: f64,
    pub metrics_interval: f64,
    /// Hand out a task every tick to the first idle connected node.
    pub max_task_load: bool,
    pub min_wait: f64,
    pub max_wait: f64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            task_interval: 120.0,
            metrics_interval: 3.0,
            max_task_load: false,
            min_wait: 10.0,
            max_wait: 60.0,
        }
    }
}

/// One metrics evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FleetMetrics {
    /// Seconds since the run started.
    pub elapsed: f64,
    /// Share of nodes that reported themselves connected, in percent.
    pub connection_percentage: f64,
    /// Completed transports per hour and node.
    pub throughput_per_node: f64,
}

impl FleetMetrics {
    pub fn log_line(&self) -> String {
        format!("{};{};{}", self.elapsed, self.connection_percentage, self.throughput_per_node)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskDispatcher {
    settings: DispatcherSettings,
    agent_count: usize,
    time_till_task: f64,
    time_till_metrics: f64,
    logged_feedback: Vec<StatusReport>,
    connected: Vec<AgentAddress>,
    completed_tasks: u64,
    last_feedback: Option<(f64, AgentAddress)>,
    last_metrics: Option<FleetMetrics>,
}

impl TaskDispatcher {
    pub fn new(settings: DispatcherSettings) -> Self {
        Self {
            time_till_metrics: settings.metrics_interval,
            settings,
            ..Self::default()
        }
    }

    /// Start a run with `agent_count` nodes.
    pub fn initialize(&mut self, agent_count: usize) {
        self.clear();
        self.agent_count = agent_count;
        if agent_count > 0 {
            self.time_till_task = self.settings.task_interval / agent_count as f64;
        }
    }

    /// Forget everything about the previous run.
    pub fn clear(&mut self) {
        self.agent_count = 0;
        self.time_till_task = 0.0;
        self.time_till_metrics = self.settings.metrics_interval;
        self.logged_feedback.clear();
        self.connected.clear();
        self.completed_tasks = 0;
        self.last_feedback = None;
        self.last_metrics = None;
    }

    pub fn completed_tasks(&self) -> u64 {
        self.completed_tasks
    }

    /// Nodes that reported themselves connected in the last evaluation.
    pub fn connected(&self) -> &[AgentAddress] {
        &self.connected
    }

    pub fn last_metrics(&self) -> Option<&FleetMetrics> {
        self.last_metrics.as_ref()
    }

    /// Advance by `dt` seconds. Outgoing messages land in `outbox`.
    ///
    /// # Parameters
    ///
    /// * `elapsed` - Seconds since the run started, after this step
    /// * `dt` - Step length in seconds
    /// * `agents` - Snapshot of every node in roster order
    /// * `graph` - Navigation graph to pick destinations from
    ///
    /// # Returns
    ///
    /// The metrics when an evaluation happened during this step.
    pub fn update(&mut self, elapsed: f64, dt: f64, agents: &[AgentView], graph: &NavigationGraph, rng: &mut StdRng, outbox: &mut Vec<Message>) -> Option<FleetMetrics> {
        if self.agent_count == 0 {
            return None;
        }

        if self.settings.max_task_load {
            if let Some(recipient) = self.first_idle_connected(agents) {
                if let Some(task) = self.random_task(recipient, agents, graph, rng) {
                    outbox.push(task);
                }
            }
        } else {
            self.time_till_task -= dt;
            if self.time_till_task <= 0.0 {
                self.time_till_task = self.settings.task_interval / self.agent_count as f64;
                let recipient = self.first_idle_connected(agents).or_else(|| (!agents.is_empty()).then(|| agents[rng.gen_range(0..agents.len())].address));
                if let Some(task) = recipient.and_then(|r| self.random_task(r, agents, graph, rng)) {
                    outbox.push(task);
                }
            }
        }

        self.time_till_metrics -= dt;
        if self.time_till_metrics < 0.0 {
            self.time_till_metrics = self.settings.metrics_interval;
            let metrics = self.evaluate(elapsed);
            self.last_metrics = Some(metrics);
            return Some(metrics);
        }
        None
    }

    fn first_idle_connected(&self, agents: &[AgentView]) -> Option<AgentAddress> {
        agents.iter().find(|a| a.state == AgentState::Idle && self.connected.contains(&a.address)).map(|a| a.address)
    }

    /// Task/parking nodes no agent currently stands on.
    fn free_destinations(agents: &[AgentView], graph: &NavigationGraph) -> Vec<NodeId> {
        [NodeKind::Task, NodeKind::Parking]
            .iter()
            .flat_map(|&kind| graph.nodes_of_kind(kind))
            .filter(|&id| graph.position(id).is_some_and(|p| agents.iter().all(|a| a.position.distance(&p) >= OCCUPANCY_RADIUS)))
            .collect()
    }

    fn random_task(&self, recipient: AgentAddress, agents: &[AgentView], graph: &NavigationGraph, rng: &mut StdRng) -> Option<Message> {
        let free = Self::free_destinations(agents, graph);
        if free.is_empty() {
            debug!("Every destination is occupied, skipping task for agent {}", recipient);
            return None;
        }
        let destination = free[rng.gen_range(0..free.len())];
        let wait_time = rng.gen_range(self.settings.min_wait..self.settings.max_wait);
        debug!("New task: agent {} drives to {} and waits {:.1}s", recipient, destination, wait_time);
        Some(Message::task(
            recipient,
            TaskOrder {
                destination,
                wait_time,
                is_relay_task: false,
            },
        ))
    }

    /// Handle a message handed up by an access point.
    ///
    /// Status reports are accepted when more than a second passed since the
    /// previous accepted one or the sender differs; each accepted report is
    /// acknowledged.
    pub fn receive(&mut self, message: &Message, now: f64, outbox: &mut Vec<Message>) {
        let MessageKind::Status(report) = &message.kind else {
            return;
        };
        let accept = match self.last_feedback {
            None => true,
            Some((at, sender)) => now - at > FEEDBACK_DEDUPE_SECONDS || sender != report.sender,
        };
        if !accept {
            return;
        }

        self.logged_feedback.push(*report);
        self.completed_tasks += u64::from(report.completed_tasks);
        self.last_feedback = Some((now, report.sender));
        outbox.push(Message::acknowledge(report.sender));
    }

    fn evaluate(&mut self, elapsed: f64) -> FleetMetrics {
        self.connected.clear();
        for report in self.logged_feedback.drain(..) {
            if report.is_connected && !self.connected.contains(&report.sender) {
                self.connected.push(report.sender);
            }
        }

        let agents = self.agent_count as f64;
        let connection_percentage = self.connected.len() as f64 / agents * 100.0;
        let throughput_per_node = if elapsed > 0.0 { self.completed_tasks as f64 / elapsed * 3600.0 / agents } else { 0.0 };

        FleetMetrics {
            elapsed,
            connection_percentage,
            throughput_per_node,
        }
    }
}
