//! Central simulation world.
//!
//! [`Simulation`] owns the navigation graph, the radio medium, every node,
//! the dispatcher, the timer queue and the result log, and advances them in
//! fixed discrete ticks.
//!
//! ## Tick order
//!
//! 1. Dispatcher: task assignment and metrics evaluation
//! 2. Agents, in scene registration order
//! 3. Due timers (bid window closures)
//!
//! After each step the pending transmissions are drained in FIFO order.
//! Messages produced while handling a delivery are queued behind the ones
//! already pending, so delivery is breadth-first and a long relay chain can
//! never recurse.
//!
//! All randomness comes from one seeded `StdRng`, so a scene, a config and
//! a seed fully determine a run.

use std::collections::VecDeque;
use std::rc::Rc;

use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::access_point::AccessPoint;
use super::agent::{AgentContext, AgentSettings, NodeAgent};
use super::dispatcher::{AgentView, DispatcherSettings, FleetMetrics, TaskDispatcher};
use super::geometry::{ObstacleField, OpenField};
use super::graph::NavigationGraph;
use super::message::{Message, SharedMessage};
use super::relay_planner::RelayPlanner;
use super::result_log::{ResultLog, RunHeader};
use super::timer::{TimerEvent, TimerQueue};
use super::transmission::{Medium, ReceiverId, TransmissionModel};
use super::types::Point;
use crate::common::config::SimulationConfig;
use crate::common::scene::{Scene, build_graph};

impl From<&SimulationConfig> for AgentSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            speed: config.agent.speed,
            destination_tolerance: config.agent.destination_tolerance,
            feedback_interval: config.agent.feedback_interval,
            assist_request_timeout: config.agent.assist_request_timeout,
            connection_probability_threshold: config.agent.connection_probability_threshold,
            relay_wait_seconds: config.agent.relay_wait_seconds,
            bid_window_seconds: config.radio.bid_window_seconds,
            ad_hoc: config.ad_hoc,
            adaptive: config.adaptive,
        }
    }
}

impl From<&SimulationConfig> for DispatcherSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            task_interval: config.task_interval,
            metrics_interval: config.metrics_interval,
            max_task_load: config.max_task_load,
            ..DispatcherSettings::default()
        }
    }
}

/// A message on the air, waiting to be delivered.
struct Transmission {
    origin: Point,
    message: SharedMessage,
}

pub struct Simulation {
    config: SimulationConfig,
    graph: NavigationGraph,
    medium: Medium,
    planner: RelayPlanner,
    agents: Vec<NodeAgent>,
    access_points: Vec<AccessPoint>,
    dispatcher: TaskDispatcher,
    timers: TimerQueue,
    pending: VecDeque<Transmission>,
    log: ResultLog,
    rng: StdRng,
    now_ms: u64,
}

impl Simulation {
    /// Empty world. Call [`Simulation::initialize`] to load a scene.
    pub fn new(config: SimulationConfig) -> Self {
        let medium = Medium::new(TransmissionModel::new(config.radio.max_range, config.radio.obstruction_tolerance, Box::new(OpenField)));
        Self {
            rng: StdRng::seed_from_u64(config.seed.unwrap_or_default()),
            dispatcher: TaskDispatcher::new(DispatcherSettings::from(&config)),
            planner: RelayPlanner::new(Vec::new(), config.radio.max_range, config.radio.relay_search_factor),
            config,
            graph: NavigationGraph::new(),
            medium,
            agents: Vec::new(),
            access_points: Vec::new(),
            timers: TimerQueue::new(),
            pending: VecDeque::new(),
            log: ResultLog::new(),
            now_ms: 0,
        }
    }

    /// Discard the current run and populate the world from `scene`.
    pub fn initialize(&mut self, scene: &Scene) {
        self.reset();

        let seed = self.config.seed.unwrap_or(scene.seed);
        self.rng = StdRng::seed_from_u64(seed);

        let (graph, _) = build_graph(scene);
        self.graph = graph;

        let radio = &self.config.radio;
        let occlusion = ObstacleField::new(scene.obstacles.clone());
        let crossings = self.graph.obstructed_edge_count(&occlusion);
        if crossings > 0 {
            warn!("{} edge/obstacle crossings in the navigation graph", crossings);
        }
        self.medium = Medium::new(TransmissionModel::new(radio.max_range, radio.obstruction_tolerance, Box::new(occlusion)));
        self.planner = RelayPlanner::from_graph(&self.graph, radio.max_range, radio.relay_search_factor);

        self.access_points = scene.access_points.iter().map(|ap| AccessPoint::new(ap.position, ap.working)).collect();

        let settings = AgentSettings::from(&self.config);
        for (index, placement) in scene.agents.iter().enumerate() {
            let mut agent = NodeAgent::new(placement.address, index, placement.position, settings.clone(), &mut self.rng);
            agent.initialize_knowledge(&self.graph);
            self.agents.push(agent);
        }

        self.dispatcher.initialize(self.agents.len());

        self.log.log_configuration(&RunHeader {
            seed,
            world_size: (scene.world_size.x, scene.world_size.y),
            agents: self.agents.len(),
            access_points: self.access_points.len(),
            obstacles: scene.obstacles.len(),
            ad_hoc: self.config.ad_hoc,
            adaptive: self.config.adaptive,
        });

        info!(
            "Simulation initialized: {} nodes, {} edges, {} agents, {} access points, {} obstacles, radio range {} (seed {})",
            self.graph.node_count(),
            self.graph.edge_count(),
            self.agents.len(),
            self.access_points.len(),
            scene.obstacles.len(),
            self.medium.model().max_range(),
            seed
        );
    }

    /// Drop every entity, pending transmission and timer.
    ///
    /// Timers are cleared in one step and their handles invalidated, so no
    /// bid window opened before the reset can fire afterwards.
    pub fn reset(&mut self) {
        self.timers.clear();
        self.pending.clear();
        self.agents.clear();
        self.access_points.clear();
        self.graph.clear();
        self.dispatcher.clear();
        self.log.reset();
        self.medium.reset_counters();
        self.now_ms = 0;
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn graph(&self) -> &NavigationGraph {
        &self.graph
    }

    pub fn medium(&self) -> &Medium {
        &self.medium
    }

    pub fn agents(&self) -> &[NodeAgent] {
        &self.agents
    }

    pub fn access_points(&self) -> &[AccessPoint] {
        &self.access_points
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn log(&self) -> &ResultLog {
        &self.log
    }

    /// Simulated seconds since initialization.
    pub fn now_seconds(&self) -> f64 {
        self.now_ms as f64 / 1000.0
    }

    /// Advance the world by one tick.
    ///
    /// # Returns
    ///
    /// The fleet metrics if the dispatcher evaluated them during this tick.
    pub fn tick(&mut self) -> Option<FleetMetrics> {
        let tick_ms = self.config.tick_millis();
        let dt = tick_ms as f64 / 1000.0;
        self.now_ms += tick_ms;
        let elapsed = self.now_seconds();

        let views: Vec<AgentView> = self
            .agents
            .iter()
            .map(|a| AgentView {
                address: a.address(),
                state: a.state(),
                position: a.position(),
            })
            .collect();
        let mut orders = Vec::new();
        let metrics = self.dispatcher.update(elapsed, dt, &views, &self.graph, &mut self.rng, &mut orders);
        if let Some(metrics) = &metrics {
            self.log.log(metrics.log_line());
        }
        self.send_from_access_points(orders);
        self.drain();

        let working = self.working_access_points();
        for index in 0..self.agents.len() {
            let mut outbox = Vec::new();
            let mut ctx = AgentContext {
                graph: &self.graph,
                planner: &self.planner,
                access_points: &working,
                timers: &mut self.timers,
                outbox: &mut outbox,
                rng: &mut self.rng,
                now_ms: self.now_ms,
            };
            self.agents[index].update(dt, &mut ctx);
            self.enqueue_from_agent(index, outbox);
            self.drain();
        }

        for (handle, event) in self.timers.pop_due(self.now_ms) {
            match event {
                TimerEvent::CloseBidWindow { agent } => {
                    if agent >= self.agents.len() {
                        continue;
                    }
                    let mut outbox = Vec::new();
                    let mut ctx = AgentContext {
                        graph: &self.graph,
                        planner: &self.planner,
                        access_points: &working,
                        timers: &mut self.timers,
                        outbox: &mut outbox,
                        rng: &mut self.rng,
                        now_ms: self.now_ms,
                    };
                    self.agents[agent].close_bid_window(handle, &mut ctx);
                    self.enqueue_from_agent(agent, outbox);
                    self.drain();
                }
            }
        }

        metrics
    }

    /// Run ticks until `duration` more simulated seconds have passed.
    ///
    /// # Returns
    ///
    /// Number of ticks executed.
    pub fn run_for(&mut self, duration: f64) -> u64 {
        let end_ms = self.now_ms + (duration * 1000.0).round() as u64;
        let mut ticks = 0;
        if self.config.tick_millis() == 0 {
            warn!("Tick length {}s is below one millisecond, not running", self.config.tick_seconds);
            return ticks;
        }
        while self.now_ms < end_ms {
            self.tick();
            ticks += 1;
        }
        debug!("Ran {} ticks, {} transmissions, {} deliveries", ticks, self.medium.transmissions(), self.medium.deliveries());
        ticks
    }

    /// Put `message` on the air at `origin` and deliver everything it causes.
    pub fn transmit(&mut self, origin: Point, message: Message) {
        self.pending.push_back(Transmission {
            origin,
            message: message.into_shared(),
        });
        self.drain();
    }

    fn working_access_points(&self) -> Vec<Point> {
        self.access_points.iter().filter(|ap| ap.is_working()).map(|ap| ap.position()).collect()
    }

    fn enqueue_from_agent(&mut self, index: usize, outbox: Vec<SharedMessage>) {
        let origin = self.agents[index].position();
        self.pending.extend(outbox.into_iter().map(|message| Transmission { origin, message }));
    }

    /// Broadcast dispatcher messages from every working access point.
    ///
    /// All copies share one message, and with it one hop budget.
    fn send_from_access_points(&mut self, messages: Vec<Message>) {
        for message in messages {
            let message = message.into_shared();
            for ap in self.access_points.iter().filter(|ap| ap.is_working()) {
                self.pending.push_back(Transmission {
                    origin: ap.position(),
                    message: Rc::clone(&message),
                });
            }
        }
    }

    fn drain(&mut self) {
        let elapsed = self.now_seconds();
        let working = self.working_access_points();

        while let Some(tx) = self.pending.pop_front() {
            let roster: Vec<(ReceiverId, Point)> = self
                .agents
                .iter()
                .enumerate()
                .map(|(i, a)| (ReceiverId::Agent(i), a.position()))
                .chain(self.access_points.iter().enumerate().map(|(i, ap)| (ReceiverId::AccessPoint(i), ap.position())))
                .collect();

            for receiver in self.medium.broadcast(&tx.origin, roster) {
                match receiver {
                    ReceiverId::Agent(index) => {
                        let mut outbox = Vec::new();
                        let mut ctx = AgentContext {
                            graph: &self.graph,
                            planner: &self.planner,
                            access_points: &working,
                            timers: &mut self.timers,
                            outbox: &mut outbox,
                            rng: &mut self.rng,
                            now_ms: self.now_ms,
                        };
                        self.agents[index].receive(&tx.message, &mut ctx);
                        self.enqueue_from_agent(index, outbox);
                    }
                    ReceiverId::AccessPoint(index) => {
                        if self.access_points[index].accepts(&tx.message) {
                            let mut replies = Vec::new();
                            self.dispatcher.receive(&tx.message, elapsed, &mut replies);
                            self.send_from_access_points(replies);
                        }
                    }
                }
            }
        }
    }
}
