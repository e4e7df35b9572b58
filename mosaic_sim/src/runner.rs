//! Scenario runner - drives the session registry against the simulated host.

use crate::context::SimContext;
use crate::error::{ensure, SimError};
use crate::host::{ClientCell, SimHost, GROUND_Y};
use crate::scenarios::ScenarioId;

use mosaic_core::{
    run_distance_sweep, InMemoryCatalog, Intent, IntentKind, OutgoingVerdict, Requester, ScrollDirection, SessionCommand,
    SessionRegistry, SessionSummary, Verdict, WallConfig, WallLayout,
};
use mosaic_env::{
    BlockFace, BlockPos, BlockState, CatalogItem, Category, ChannelDisplay, DisplayChannel, DisplayUpdate, MosaicContext,
    PaletteEncoder, Pose, ViewerId, WorldId,
};
use rand::Rng;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// The world every scenario starts in.
pub const WORLD: WorldId = WorldId(0);

/// One server tick (20 Hz).
const TICK: Duration = Duration::from_millis(50);

/// Base state of display surfaces on the wire.
const SURFACE_STATE: &str = "minecraft:player_wall_head";

/// Real blocks sprinkled around spawn so restoration has something to get wrong.
const SCATTER: [&str; 3] = ["minecraft:oak_log", "minecraft:glass", "minecraft:torch"];

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Total ticks executed
    pub total_ticks: u64,

    /// Final simulation time in seconds
    pub final_time_secs: f64,

    /// Sessions still registered at the end
    pub active_sessions: usize,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScenarioMetrics {
    /// Sessions mounted through the request front-end
    pub sessions_opened: u64,

    /// Display updates that reached a client
    pub display_updates: u64,

    /// Client actions fed through the interception boundary
    pub intents: u64,

    /// Client actions vetoed
    pub vetoes: u64,

    /// Items granted
    pub grants: u64,

    /// Sessions evicted by the distance sweep
    pub evictions: u64,
}

/// Runs simulation scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Wall configuration handed to the registry
    config: WallConfig,

    /// Number of viewers in multi-viewer scenarios
    viewers: usize,

    /// Client actions per viewer
    actions: usize,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64, config: WallConfig) -> Self {
        Self {
            seed,
            config,
            viewers: 8,
            actions: 200,
        }
    }

    /// Sets the number of viewers.
    pub fn with_viewers(mut self, viewers: usize) -> Self {
        self.viewers = viewers.max(1);
        self
    }

    /// Sets the number of client actions per viewer.
    pub fn with_actions(mut self, actions: usize) -> Self {
        self.actions = actions.max(1);
        self
    }

    /// Runs a scenario and returns the result.
    pub fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        debug!("{}", scenario.description());
        if scenario.is_concurrent() {
            debug!(viewers = self.viewers, "Driving the registry from concurrent threads");
        }

        let mut h = match Harness::new(self.seed, self.config.clone(), scenario == ScenarioId::Wire) {
            Ok(h) => h,
            Err(e) => {
                warn!("{} could not start: {}", scenario.name(), e);
                return ScenarioResult {
                    scenario,
                    seed: self.seed,
                    passed: false,
                    total_ticks: 0,
                    final_time_secs: 0.0,
                    active_sessions: 0,
                    failure_reason: Some(e.to_string()),
                    metrics: ScenarioMetrics::default(),
                };
            }
        };
        let outcome = match scenario {
            ScenarioId::Browse => self.run_browse(&mut h),
            ScenarioId::Tamper => self.run_tamper(&mut h),
            ScenarioId::LiveRestore => self.run_live_restore(&mut h),
            ScenarioId::WalkAway => self.run_walk_away(&mut h),
            ScenarioId::Shutdown => self.run_shutdown(&mut h),
            ScenarioId::Crowd => self.run_crowd(&mut h),
            ScenarioId::Wire => self.run_wire(&mut h),
        };

        h.pump();
        h.metrics.display_updates = h.host.display_updates();
        h.metrics.grants = h.viewers.iter().map(|v| h.host.grants(*v).len() as u64).sum();

        let failure_reason = match outcome {
            Ok(()) => None,
            Err(e) => {
                warn!("{} failed: {}", scenario.name(), e);
                Some(e.to_string())
            }
        };

        ScenarioResult {
            scenario,
            seed: self.seed,
            passed: failure_reason.is_none(),
            total_ticks: h.ticks,
            final_time_secs: h.context.now().as_secs_f64(),
            active_sessions: h.registry.len(),
            failure_reason,
            metrics: h.metrics,
        }
    }

    /// SIM-001: mount a multi-page wall, scroll past both ends, exit.
    fn run_browse(&self, h: &mut Harness) -> Result<(), SimError> {
        let viewer = ViewerId::from_seed(self.seed);
        let pose = h.random_pose(0.5, 0.5);
        h.join(viewer, pose);

        let planned = Cells::planned(&pose, &self.config);
        let before = h.host.snapshot(WORLD, &planned.all());

        let summary = h.mount(viewer, Category::Animals)?;
        let pages = summary.number_of_pages;
        ensure(pages == 95usize.div_ceil(self.config.layout.page_size()), || {
            format!("expected {} items to span more pages, got {}", summary.item_count, pages)
        })?;
        ensure(h.host.messages(viewer).contains(&format!("Showing page 1/{}", pages)), || {
            "missing page banner".to_string()
        })?;

        let cells = h.cells(viewer)?;
        ensure(cells == planned, || "registered layout differs from the planned one".to_string())?;
        h.check_page(viewer, &cells, Category::Animals, 0, summary.item_count)?;

        for _ in 0..pages {
            h.registry.on_scroll(viewer, ScrollDirection::from_slots(0, 1));
            h.step();
        }
        ensure(h.current_page(viewer)? == pages - 1, || "forward scrolling did not stop on the last page".to_string())?;
        ensure(
            h.host.messages(viewer).last() == Some(&format!("You're already on the last page, at {}/{}", pages, pages)),
            || "missing last-page notice".to_string(),
        )?;
        h.check_page(viewer, &cells, Category::Animals, pages - 1, summary.item_count)?;

        for _ in 0..pages {
            h.registry.on_scroll(viewer, ScrollDirection::from_slots(1, 0));
            h.step();
        }
        ensure(h.current_page(viewer)? == 0, || "backward scrolling did not stop on the first page".to_string())?;
        h.check_page(viewer, &cells, Category::Animals, 0, summary.item_count)?;

        ensure(h.registry.on_exit_gesture(viewer), || "exit gesture found no session".to_string())?;
        ensure(!h.registry.on_exit_gesture(viewer), || "second exit gesture ended a session".to_string())?;
        h.expect_restored(viewer, &cells.all(), &before)
    }

    /// SIM-002: random vetoed actions; the client must end up exactly where
    /// it was before predicting each one.
    fn run_tamper(&self, h: &mut Harness) -> Result<(), SimError> {
        let viewer = ViewerId::from_seed(self.seed);
        let pose = h.random_pose(0.5, 0.5);
        h.join(viewer, pose);

        let planned = Cells::planned(&pose, &self.config);
        let before = h.host.snapshot(WORLD, &planned.all());
        h.mount(viewer, Category::Blocks)?;

        let mut targets = planned.all();
        targets.push(pose.block_pos().raised(-1));
        targets.push(planned.bottom_center.shifted(planned.facing, 2));

        let mut rng = h.context.rng_for(1);
        let mut primary_on_items = 0;

        for _ in 0..self.actions {
            let kind = random_intent(&mut rng, &targets);
            let watched = kind.mutation_target();
            let shown_before = watched.map(|pos| h.host.client_cell(viewer, WORLD, pos));

            if let IntentKind::Break { target } = kind {
                if planned.display.contains(&target) {
                    primary_on_items += 1;
                }
            }

            let (verdict, sequence) = h.intent(viewer, kind);
            ensure(verdict == Verdict::Veto, || format!("{:?} reached the world", kind))?;
            ensure(h.host.acks(viewer).last() == Some(&sequence), || {
                format!("sequence {} was not acknowledged", sequence)
            })?;
            if let (Some(pos), Some(shown)) = (watched, shown_before) {
                let now = h.host.client_cell(viewer, WORLD, pos);
                ensure(now == shown, || format!("client kept prediction at {}: {:?} -> {:?}", pos, shown, now))?;
            }

            h.step();
            h.context.advance_time(Duration::from_millis(rng.gen_range(0..400)));
        }

        let acks = h.host.acks(viewer);
        ensure(acks == (1..=self.actions as i32).collect::<Vec<_>>(), || "acknowledgements out of order".to_string())?;
        ensure(h.host.held_resyncs() == self.actions as u64, || "held item not resynced after every action".to_string())?;

        let grants = h.host.grants(viewer);
        ensure(grants.len() <= primary_on_items, || "more grants than primary clicks on items".to_string())?;
        ensure(grants.iter().all(|id| id.starts_with("blocks-")), || "granted an item from another category".to_string())?;

        h.registry.on_exit_gesture(viewer);
        h.expect_restored(viewer, &planned.all(), &before)
    }

    /// SIM-003: real changes under the wall stay hidden until the wall
    /// goes away, then show up.
    fn run_live_restore(&self, h: &mut Harness) -> Result<(), SimError> {
        let viewer = ViewerId::from_seed(self.seed);
        let pose = h.random_pose(0.5, 0.5);
        h.join(viewer, pose);
        h.mount(viewer, Category::Animals)?;
        let cells = h.cells(viewer)?;

        let gold = BlockState::new("minecraft:gold_block");
        let wall_cell = cells.wall[0];
        let display_cell = cells.display[0];
        let outside = BlockPos::new(pose.block_pos().x + 30, GROUND_Y, pose.block_pos().z + 30);

        for pos in [wall_cell, display_cell] {
            h.host.set_block(WORLD, pos, gold.clone());
            ensure(h.world_update(viewer, pos) == OutgoingVerdict::Suppress, || {
                format!("update for covered cell {} was forwarded", pos)
            })?;
        }
        h.host.set_block(WORLD, outside, gold.clone());
        ensure(h.world_update(viewer, outside) == OutgoingVerdict::Pass, || "update outside the wall was suppressed".to_string())?;

        ensure(
            h.host.client_cell(viewer, WORLD, wall_cell) == ClientCell::Block(self.config.layout.wall_surface.clone()),
            || "wall cell lost its fake content".to_string(),
        )?;
        ensure(
            h.host.client_cell(viewer, WORLD, outside) == ClientCell::Block(gold.clone()),
            || "forwarded update did not reach the client".to_string(),
        )?;

        h.registry.on_exit_gesture(viewer);
        ensure(h.world_update(viewer, wall_cell) == OutgoingVerdict::Pass, || "updates still suppressed after exit".to_string())?;
        ensure(
            h.host.client_cell(viewer, WORLD, display_cell) == ClientCell::Block(gold),
            || "close restored stale content".to_string(),
        )?;
        let mismatched = h.host.mismatches(viewer, WORLD, &cells.all());
        ensure(mismatched.is_empty(), || format!("{} cells not restored", mismatched.len()))
    }

    /// SIM-004: sweep eviction by distance, world change and disconnect.
    fn run_walk_away(&self, h: &mut Harness) -> Result<(), SimError> {
        let limit = self.config.removal_distance_squared();

        // Walking backwards until the sweep catches it
        let walker = ViewerId::from_seed(self.seed);
        let mut pose = h.random_pose(0.5, 0.5);
        h.join(walker, pose);
        let planned = Cells::planned(&pose, &self.config);
        let before = h.host.snapshot(WORLD, &planned.all());
        h.mount(walker, Category::FoodDrinks)?;

        let (dx, _, dz) = planned.facing.opposite().offset();
        for _ in 0..10_000 {
            pose.x += 0.25 * dx as f64;
            pose.z += 0.25 * dz as f64;
            h.host.move_viewer(walker, pose);

            if !h.tick() {
                continue;
            }
            let distance = h.registry.with_session(walker, |s, _| s.distance_squared_to(&pose)).flatten();
            let evicted = h.sweep();
            match distance {
                Some(d) if d <= limit => {
                    ensure(evicted == 0 && h.registry.is_active(walker), || format!("evicted at distance² {:.1}", d))?
                }
                Some(d) => {
                    ensure(evicted == 1, || format!("kept session at distance² {:.1}", d))?;
                    break;
                }
                None => return Err(SimError::invariant("session vanished before the sweep")),
            }
        }
        ensure(!h.registry.is_active(walker), || "walker never evicted".to_string())?;
        ensure(
            h.host.messages(walker).iter().any(|m| m.starts_with("You've exceeded the max distance")),
            || "walker not told about the eviction".to_string(),
        )?;
        h.expect_restored(walker, &planned.all(), &before)?;

        // Same coordinates, another world: not comparable, so evicted
        let traveller = ViewerId::from_seed(self.seed.wrapping_add(1));
        let home = h.random_pose(64.5, 0.5);
        h.join(traveller, home);
        h.mount(traveller, Category::FoodDrinks)?;
        h.host.move_viewer(traveller, Pose { world: WorldId(1), ..home });
        h.run_until_sweep();
        ensure(!h.registry.is_active(traveller), || "session survived a world change".to_string())?;

        // Gone without a goodbye: dropped silently
        let ghost = ViewerId::from_seed(self.seed.wrapping_add(2));
        h.join(ghost, h.random_pose(-64.5, 0.5));
        h.mount(ghost, Category::FoodDrinks)?;
        let told = h.host.messages(ghost).len();
        h.host.disconnect(ghost);
        h.run_until_sweep();
        ensure(!h.registry.is_active(ghost), || "session of disconnected viewer survived".to_string())?;
        ensure(h.host.messages(ghost).len() == told, || "disconnected viewer was messaged".to_string())
    }

    /// SIM-005: the background sweep runs on the context clock and stops
    /// once the registry shuts down; every open wall is restored.
    fn run_shutdown(&self, h: &mut Harness) -> Result<(), SimError> {
        let mut restores = Vec::new();
        for i in 0..self.viewers {
            let viewer = ViewerId::from_seed(self.seed.wrapping_add(i as u64));
            let pose = h.random_pose(i as f64 * 64.0 + 0.5, 0.5);
            h.join(viewer, pose);
            let planned = Cells::planned(&pose, &self.config);
            restores.push((viewer, planned.all(), h.host.snapshot(WORLD, &planned.all())));
            h.mount(viewer, Category::Monsters)?;
        }

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let registry = h.registry.clone();
        let expected = self.viewers;
        runtime.block_on(async move {
            let sweep = tokio::spawn(run_distance_sweep(registry.clone()));
            for _ in 0..10 {
                tokio::task::yield_now().await;
            }
            ensure(registry.len() == expected, || format!("sweep evicted {} idle viewers", expected - registry.len()))?;

            registry.shutdown();
            sweep
                .await
                .map_err(|e| SimError::invariant(format!("sweep task failed: {}", e)))
        })?;

        ensure(h.registry.is_shut_down() && h.registry.is_empty(), || "registry not drained".to_string())?;
        ensure(h.context.now() >= self.config.sweep_period(), || "sweep never slept on the context clock".to_string())?;
        for (viewer, positions, before) in &restores {
            h.expect_restored(*viewer, positions, before)?;
        }

        let (late, _, _) = &restores[0];
        ensure(h.mount(*late, Category::Animals).is_err(), || "wall opened after shutdown".to_string())?;
        ensure(h.registry.is_empty(), || "late session registered after shutdown".to_string())?;
        Ok(())
    }

    /// SIM-006: each viewer's client actions come from its own thread while
    /// the tick thread scrolls and sweeps.
    fn run_crowd(&self, h: &mut Harness) -> Result<(), SimError> {
        const CATEGORIES: [Category; 4] = [Category::Animals, Category::Monsters, Category::Blocks, Category::FoodDrinks];

        let mut crowd = Vec::new();
        for i in 0..self.viewers {
            let viewer = ViewerId::from_seed(self.seed.wrapping_add(i as u64));
            let pose = h.random_pose(i as f64 * 64.0 + 0.5, 0.5);
            h.join(viewer, pose);
            let planned = Cells::planned(&pose, &self.config);
            let before = h.host.snapshot(WORLD, &planned.all());
            h.mount(viewer, CATEGORIES[i % CATEGORIES.len()])?;
            crowd.push((viewer, planned.all(), before));
        }

        let actions = self.actions;
        let (host, registry, context) = (&h.host, &h.registry, &h.context);
        let vetoes: Vec<usize> = std::thread::scope(|scope| {
            let network: Vec<_> = crowd
                .iter()
                .enumerate()
                .map(|(i, (viewer, targets, _))| {
                    scope.spawn(move || {
                        let mut rng = context.rng_for(100 + i as u64);
                        (1..=actions as i32)
                            .filter(|sequence| {
                                let kind = random_intent(&mut rng, targets);
                                act(host, registry, *viewer, *sequence, kind) == Verdict::Veto
                            })
                            .count()
                    })
                })
                .collect();

            let mut rng = context.rng_for(99);
            for _ in 0..actions {
                let (viewer, _, _) = &crowd[rng.gen_range(0..crowd.len())];
                let direction = if rng.gen_bool(0.5) {
                    ScrollDirection::Forward
                } else {
                    ScrollDirection::Backward
                };
                registry.on_scroll(*viewer, direction);
                context.advance_time(TICK);
                registry.sweep_distance_eviction();
            }

            network.into_iter().map(|t| t.join().unwrap_or(0)).collect()
        });

        h.metrics.intents += (actions * crowd.len()) as u64;
        h.metrics.vetoes += vetoes.iter().sum::<usize>() as u64;
        ensure(vetoes.iter().all(|v| *v == actions), || format!("not every action was vetoed: {:?}", vetoes))?;
        ensure(h.registry.len() == crowd.len(), || "stationary viewers lost their walls".to_string())?;
        for (viewer, _, _) in &crowd {
            ensure(h.host.acks(*viewer) == (1..=actions as i32).collect::<Vec<_>>(), || {
                format!("{} acknowledgements out of order", viewer)
            })?;
        }

        h.registry.shutdown();
        for (viewer, positions, before) in &crowd {
            h.expect_restored(*viewer, positions, before)?;
        }
        Ok(())
    }

    /// SIM-007: everything goes through an encoded queue whose palette
    /// cannot express the wall surface.
    fn run_wire(&self, h: &mut Harness) -> Result<(), SimError> {
        let viewer = ViewerId::from_seed(self.seed);
        let pose = h.random_pose(0.5, 0.5);
        h.join(viewer, pose);

        let planned = Cells::planned(&pose, &self.config);
        let before = h.host.snapshot(WORLD, &planned.all());
        let summary = h.mount(viewer, Category::FoodDrinks)?;

        ensure(
            planned
                .wall
                .iter()
                .all(|pos| h.host.client_cell(viewer, WORLD, *pos) == ClientCell::Block(BlockState::air())),
            || "unencodable wall surface did not fall back to air".to_string(),
        )?;
        h.check_page(viewer, &planned, Category::FoodDrinks, 0, summary.item_count)?;

        let (verdict, sequence) = h.intent(viewer, IntentKind::Break { target: planned.wall[0] });
        ensure(verdict == Verdict::Veto, || "break on the wall passed".to_string())?;
        ensure(h.host.acks(viewer) == vec![sequence], || "acknowledgement lost on the wire".to_string())?;

        h.registry.on_exit_gesture(viewer);
        h.pump();
        h.expect_restored(viewer, &planned.all(), &before)
    }
}

/// Positions of one wall, split by role.
#[derive(Debug, Clone, PartialEq)]
struct Cells {
    facing: BlockFace,
    bottom_center: BlockPos,
    wall: Vec<BlockPos>,
    /// Reading order: slot index = position in this list
    display: Vec<BlockPos>,
    corridor: Vec<BlockPos>,
}

impl Cells {
    fn from_layout(layout: &WallLayout) -> Self {
        Self {
            facing: layout.facing,
            bottom_center: layout.bottom_center,
            wall: layout.wall.iter().map(|c| c.pos).collect(),
            display: layout.display_reading_order().map(|c| c.pos).collect(),
            corridor: layout.corridor.iter().map(|c| c.pos).collect(),
        }
    }

    fn planned(pose: &Pose, config: &WallConfig) -> Self {
        Self::from_layout(&WallLayout::plan(pose, &config.layout))
    }

    fn all(&self) -> Vec<BlockPos> {
        self.wall
            .iter()
            .chain(&self.display)
            .chain(&self.corridor)
            .copied()
            .collect()
    }
}

/// Encoded display queue plus the palette to decode it with.
type Wire = (mpsc::UnboundedReceiver<(ViewerId, DisplayUpdate)>, HashMap<u32, BlockState>);

struct Harness {
    context: Arc<SimContext>,
    host: Arc<SimHost>,
    registry: Arc<SessionRegistry<SimContext>>,
    command: SessionCommand<SimContext>,
    permission: String,
    wire: Option<Wire>,
    viewers: Vec<ViewerId>,
    sequences: HashMap<ViewerId, i32>,
    sweep_every: u64,
    ticks: u64,
    metrics: ScenarioMetrics,
}

impl Harness {
    fn new(seed: u64, config: WallConfig, wire: bool) -> Result<Self, SimError> {
        let context = SimContext::shared(seed);
        let host = SimHost::new();

        for _ in 0..200 {
            let r = context.next_u64();
            let pos = BlockPos::new(
                (r % 33) as i32 - 16,
                GROUND_Y + ((r >> 16) % 8) as i32,
                ((r >> 8) % 33) as i32 - 16,
            );
            host.set_block(WORLD, pos, BlockState::new(SCATTER[((r >> 24) % 3) as usize]));
        }

        let (display, wire): (Arc<dyn DisplayChannel>, Option<Wire>) = if wire {
            let (encoder, palette) = wire_palette(&config);
            let (display, rx) = ChannelDisplay::new(encoder, SURFACE_STATE);
            (Arc::new(display), Some((rx, palette)))
        } else {
            (host.clone(), None)
        };

        let sweep_every = (config.sweep_period().as_millis() / TICK.as_millis()).max(1) as u64;
        let permission = config.permission_node.clone();
        let registry = Arc::new(SessionRegistry::new(context.clone(), config, display, host.clone(), host.clone())?);
        let command = SessionCommand::new(Arc::new(catalog()), registry.clone());

        Ok(Self {
            context,
            host,
            registry,
            command,
            permission,
            wire,
            viewers: Vec::new(),
            sequences: HashMap::new(),
            sweep_every,
            ticks: 0,
            metrics: ScenarioMetrics::default(),
        })
    }

    /// A standing pose at ground level looking in a random direction.
    fn random_pose(&self, x: f64, z: f64) -> Pose {
        let yaw = (self.context.next_u64() % 360) as f32 - 180.0;
        Pose::new(WORLD, x, GROUND_Y as f64, z, yaw)
    }

    fn join(&mut self, viewer: ViewerId, pose: Pose) {
        self.host.connect(viewer, pose);
        self.viewers.push(viewer);
    }

    fn mount(&mut self, viewer: ViewerId, category: Category) -> Result<SessionSummary, SimError> {
        let requester = Requester::Viewer {
            id: viewer,
            permissions: vec![self.permission.clone()],
        };
        let summary = self.command.run(&requester, &[category.name()]).ok_or_else(|| {
            SimError::invariant(format!(
                "{} could not open {}: {:?}",
                viewer,
                category,
                self.host.messages(viewer).last()
            ))
        })?;
        self.metrics.sessions_opened += 1;
        self.pump();
        Ok(summary)
    }

    fn cells(&self, viewer: ViewerId) -> Result<Cells, SimError> {
        self.registry
            .with_session(viewer, |s, _| Cells::from_layout(s.layout()))
            .ok_or_else(|| SimError::invariant(format!("{} has no session", viewer)))
    }

    fn current_page(&self, viewer: ViewerId) -> Result<usize, SimError> {
        self.registry
            .with_session(viewer, |s, _| s.current_page())
            .ok_or_else(|| SimError::invariant(format!("{} has no session", viewer)))
    }

    /// Advances one tick. Returns true when a sweep is due.
    fn tick(&mut self) -> bool {
        self.context.advance_time(TICK);
        self.ticks += 1;
        self.pump();
        self.ticks % self.sweep_every == 0
    }

    fn sweep(&mut self) -> usize {
        let evicted = self.registry.sweep_distance_eviction();
        self.metrics.evictions += evicted as u64;
        self.pump();
        evicted
    }

    fn step(&mut self) {
        if self.tick() {
            self.sweep();
        }
    }

    fn run_until_sweep(&mut self) {
        while !self.tick() {}
        self.sweep();
    }

    fn intent(&mut self, viewer: ViewerId, kind: IntentKind) -> (Verdict, i32) {
        let sequence = self.sequences.entry(viewer).or_insert(0);
        *sequence += 1;
        let sequence = *sequence;

        let verdict = act(&self.host, &self.registry, viewer, sequence, kind);
        self.metrics.intents += 1;
        if verdict == Verdict::Veto {
            self.metrics.vetoes += 1;
        }
        self.pump();
        (verdict, sequence)
    }

    /// A real world change the server would normally forward to `viewer`.
    fn world_update(&mut self, viewer: ViewerId, pos: BlockPos) -> OutgoingVerdict {
        let verdict = self.registry.filter_outgoing(viewer, pos);
        if verdict == OutgoingVerdict::Pass {
            self.host.forward_world_update(viewer, WORLD, pos);
        }
        verdict
    }

    /// Drains the encoded display queue into the clients.
    fn pump(&mut self) {
        if let Some((rx, palette)) = &mut self.wire {
            while let Ok((viewer, update)) = rx.try_recv() {
                self.host.apply_wire(viewer, update, palette);
            }
        }
    }

    fn check_page(
        &self,
        viewer: ViewerId,
        cells: &Cells,
        category: Category,
        page: usize,
        item_count: usize,
    ) -> Result<(), SimError> {
        let first = page * cells.display.len();
        for (slot, pos) in cells.display.iter().enumerate() {
            let expected = if first + slot < item_count {
                ClientCell::Surface {
                    texture: texture(category, first + slot),
                }
            } else {
                ClientCell::Block(BlockState::air())
            };
            let shown = self.host.client_cell(viewer, WORLD, *pos);
            ensure(shown == expected, || {
                format!("page {} slot {}: expected {:?}, client shows {:?}", page + 1, slot, expected, shown)
            })?;
        }

        ensure(
            cells
                .corridor
                .iter()
                .all(|pos| self.host.client_cell(viewer, WORLD, *pos) == ClientCell::Block(BlockState::air())),
            || "corridor not cleared".to_string(),
        )
    }

    /// The world under `positions` is as it was, and the client agrees.
    fn expect_restored(&self, viewer: ViewerId, positions: &[BlockPos], before: &[BlockState]) -> Result<(), SimError> {
        ensure(self.host.snapshot(WORLD, positions) == before, || "the real world was modified".to_string())?;
        let mismatched = self.host.mismatches(viewer, WORLD, positions);
        ensure(mismatched.is_empty(), || {
            format!("{} cells not restored for {}, first at {}", mismatched.len(), viewer, mismatched[0])
        })
    }
}

/// Client side of one action: predict locally, then send it to the server.
fn act(
    host: &SimHost,
    registry: &SessionRegistry<SimContext>,
    viewer: ViewerId,
    sequence: i32,
    kind: IntentKind,
) -> Verdict {
    match kind {
        IntentKind::Break { target } => host.client_predict(viewer, target, BlockState::air()),
        IntentKind::UseOn { builds: true, .. } => {
            if let Some(pos) = kind.mutation_target() {
                host.client_predict(viewer, pos, BlockState::new("minecraft:dirt"));
            }
        }
        _ => {}
    }
    registry.on_intent(viewer, Intent::new(sequence, kind))
}

fn random_intent(rng: &mut impl Rng, targets: &[BlockPos]) -> IntentKind {
    const FACES: [BlockFace; 6] = [
        BlockFace::North,
        BlockFace::South,
        BlockFace::East,
        BlockFace::West,
        BlockFace::Up,
        BlockFace::Down,
    ];

    let target = targets[rng.gen_range(0..targets.len())];
    match rng.gen_range(0..4) {
        0 | 1 => IntentKind::Break { target },
        2 => IntentKind::UseOn {
            target,
            face: FACES[rng.gen_range(0..FACES.len())],
            builds: rng.gen_bool(0.5),
        },
        _ => IntentKind::UseInAir,
    }
}

fn texture(category: Category, index: usize) -> String {
    format!("tex:{}:{}", category.name(), index)
}

/// Fixed catalog: enough animals for several pages, one category that
/// fills exactly one page, a short one, and a large one.
fn catalog() -> InMemoryCatalog {
    let counts = [
        (Category::Animals, 95),
        (Category::Blocks, 40),
        (Category::FoodDrinks, 7),
        (Category::Monsters, 120),
    ];

    InMemoryCatalog::from_items(counts.into_iter().flat_map(|(category, count)| {
        (0..count).map(move |i| CatalogItem {
            id: format!("{}-{}", category.name().to_lowercase(), i),
            name: format!("{} #{}", category, i),
            category,
            tags: vec![category.name().to_lowercase()],
            texture: texture(category, i),
        })
    }))
}

/// Everything the simulated terrain and display surfaces use, except the
/// configured wall surface.
fn wire_palette(config: &WallConfig) -> (PaletteEncoder, HashMap<u32, BlockState>) {
    let mut states: Vec<String> = vec![BlockState::AIR.to_string(), "minecraft:stone".to_string()];
    states.extend(SCATTER.iter().map(|s| s.to_string()));
    states.extend(
        ["north", "south", "east", "west", "up", "down"]
            .iter()
            .map(|facing| format!("{}[facing={}]", SURFACE_STATE, facing)),
    );
    states.retain(|s| s != config.layout.wall_surface.as_str());

    let encoder = states
        .iter()
        .enumerate()
        .fold(PaletteEncoder::default(), |encoder, (id, state)| encoder.with(state.clone(), id as u32));
    let palette = states
        .into_iter()
        .enumerate()
        .map(|(id, state)| (id as u32, BlockState::new(state)))
        .collect();
    (encoder, palette)
}
