//! The continuous simulation engine.
//!
//! [`ScalableSimulationEngine`] is a cheaply clonable handle. Timers, the
//! processing loop, the performance monitor and external callers all share
//! the same inner state:
//!
//! - **Registry** (clock, players, civilizations, regions) behind a
//!   `tokio::sync::RwLock`, never held across a model or hook await.
//! - **Queues and cache** behind `std::sync::Mutex`, held only for
//!   push/pop/lookup.
//! - **AI budgets** as atomics inside [`AdaptiveAiProcessor`].
//!
//! Game days and quarters advance on their own interval tasks, so a
//! saturated processing loop never delays the clock.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use galactic_types::{
    Action, ActionId, ActionPayload, ActionRequest, AiTier, Civilization, CivilizationId,
    DailyUpdatePayload, Decision, EngineEvent, GalaxyRegion, NewPlayer, PerformanceSnapshot,
    Player, PlayerId, Priority, QuarterlyUpdatePayload, RegionId,
};
use serde::Serialize;
use tokio::sync::{Notify, RwLock, Semaphore, broadcast};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, trace, warn};

use crate::ai::{AdaptiveAiProcessor, DecisionModel};
use crate::batcher::IntelligentBatcher;
use crate::cache::PredictiveCache;
use crate::clock::SimulationClock;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::hooks::{EngineHooks, NoOpHooks};
use crate::monitor::PerformanceMonitor;
use crate::persist::{GameSnapshot, StateStore};
use crate::queue::{EnqueueOutcome, PriorityQueues};
use crate::regions::GalaxyShards;

/// Smoothing factor of the moving averages.
pub(crate) const EMA_ALPHA: f64 = 0.1;

/// Pause after a failed processing pass.
pub const ERROR_COOLDOWN: Duration = Duration::from_secs(1);

/// Pause between processing passes for a given backlog.
pub const fn adaptive_sleep(total_queued: usize) -> Duration {
    if total_queued > 1000 {
        Duration::from_millis(1)
    } else if total_queued > 100 {
        Duration::from_millis(10)
    } else {
        Duration::from_millis(50)
    }
}

/// Region an economic update names. Player-scoped actions get theirs at
/// dispatch.
fn payload_region(payload: &ActionPayload) -> Option<RegionId> {
    match payload {
        ActionPayload::EconomicUpdate(update) => update.region_id.clone(),
        _ => None,
    }
}

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// Read-only view of the whole game.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameState {
    /// Current game day.
    pub current_game_day: u64,
    /// Current game quarter.
    pub current_quarter: u64,
    /// Day ticks since start.
    pub current_tick: u64,
    /// All registered players.
    pub total_players: usize,
    /// Players active within the activity threshold.
    pub active_players: usize,
    /// Whether timers and the processing loop are running.
    pub running: bool,
    /// Wall-clock time since start, in milliseconds.
    pub uptime_ms: u64,
    /// Region state in creation order.
    pub regions: Vec<GalaxyRegion>,
    /// Performance counters, including queue depths.
    pub performance: PerformanceSnapshot,
}

/// Read-only view of one player and the game around them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlayerGameState {
    /// The player record.
    pub player: Player,
    /// The player's region.
    pub region: Option<GalaxyRegion>,
    /// Remaining AI budget of the player's tier.
    pub tier_budget_remaining: u32,
    /// The game around the player.
    pub game: GameState,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Entities guarded by the registry lock.
#[derive(Debug)]
pub(crate) struct Registry {
    pub(crate) clock: SimulationClock,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) civilizations: BTreeMap<CivilizationId, Civilization>,
    pub(crate) shards: GalaxyShards,
}

impl Registry {
    /// Players whose last activity is within `threshold` of `now`.
    pub(crate) fn count_active(&self, now: DateTime<Utc>, threshold: Duration) -> usize {
        let Ok(window) = chrono::TimeDelta::from_std(threshold) else {
            return self.players.len();
        };
        self.players
            .values()
            .filter(|p| now.signed_duration_since(p.last_activity) < window)
            .count()
    }
}

/// Pass timing counters.
#[derive(Debug, Clone, Default)]
pub(crate) struct PassMetrics {
    pub(crate) avg_tick_time_ms: f64,
    pub(crate) processed_actions_per_second: f64,
    pub(crate) processed_actions_total: u64,
}

pub(crate) struct EngineInner {
    pub(crate) config: EngineConfig,
    pub(crate) registry: RwLock<Registry>,
    pub(crate) queues: Mutex<PriorityQueues>,
    pub(crate) cache: Mutex<PredictiveCache<String, Decision>>,
    pub(crate) ai: AdaptiveAiProcessor,
    pub(crate) hooks: Arc<dyn EngineHooks>,
    pub(crate) store: StateStore,
    pub(crate) events: EventBus,
    pub(crate) metrics: Mutex<PassMetrics>,
    pub(crate) dispatch_permits: Arc<Semaphore>,
    pub(crate) shed_actions: AtomicU64,
    pub(crate) missed_batch_deadlines: AtomicU64,
    monitor: PerformanceMonitor,
    game_day: AtomicU64,
    last_snapshot_tick: AtomicU64,
    initialized: AtomicBool,
    running: AtomicBool,
    shutdown: Arc<Notify>,
    timers: Mutex<Vec<JoinHandle<()>>>,
    processing_loop: Mutex<Option<JoinHandle<()>>>,
    monitor_task: Mutex<Option<JoinHandle<()>>>,
}

impl EngineInner {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stamp and queue an action.
    pub(crate) fn enqueue(
        &self,
        priority: Priority,
        region_id: Option<RegionId>,
        payload: ActionPayload,
    ) -> EnqueueOutcome {
        let action = Action {
            id: ActionId::new(),
            priority,
            region_id,
            payload,
            enqueued_at: Utc::now(),
            game_day: self.game_day.load(Ordering::Acquire),
        };
        let action_id = action.id;
        let kind = action.kind();
        let pushed = lock(&self.queues).push(action);
        match pushed {
            Ok(depth) => {
                trace!(action_id = %action_id, kind = %kind, priority = %priority, depth, "Action queued");
                EnqueueOutcome::Queued {
                    action_id,
                    priority,
                    depth,
                }
            }
            Err(_) => {
                self.shed_actions.fetch_add(1, Ordering::Relaxed);
                warn!(kind = %kind, priority = %priority, "Queue full, action shed");
                EnqueueOutcome::Shed { priority }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Clock ticks
    // -----------------------------------------------------------------------

    pub(crate) async fn process_day_tick(&self) -> Result<u64, EngineError> {
        let now = Utc::now();
        let (game_day, active_players) = {
            let mut registry = self.registry.write().await;
            let day = registry.clock.advance_day(now)?;
            (day, registry.count_active(now, self.config.active_player_threshold()))
        };
        self.game_day.store(game_day, Ordering::Release);
        self.enqueue(
            Priority::High,
            None,
            ActionPayload::DailyUpdate(DailyUpdatePayload { game_day }),
        );
        debug!(game_day, active_players, "Day tick");
        self.events.emit(EngineEvent::DayTick {
            game_day,
            real_time: now,
            active_players,
        });
        Ok(game_day)
    }

    pub(crate) async fn process_quarter_tick(&self) -> Result<u64, EngineError> {
        let now = Utc::now();
        // Sampled before the reset so the event reports the quarter that ended.
        let performance = self.performance().await;
        let (quarter, game_day, days_per_quarter) = {
            let mut registry = self.registry.write().await;
            let quarter = registry.clock.advance_quarter(now)?;
            registry.shards.reset_ai_load();
            (
                quarter,
                registry.clock.current_game_day(),
                registry.clock.days_per_quarter(),
            )
        };
        self.ai.reset_quarterly_budgets();
        self.enqueue(
            Priority::Batch,
            None,
            ActionPayload::QuarterlyUpdate(QuarterlyUpdatePayload { quarter }),
        );
        info!(
            quarter,
            game_day,
            days_per_quarter,
            active_players = performance.active_player_count,
            total_players = performance.total_player_count,
            ai_calls = ?performance.ai_calls_this_quarter,
            rule_based = performance.rule_based_decisions_this_quarter,
            cache_hit_rate = performance.cache_hit_rate,
            "Quarter complete"
        );
        self.events.emit(EngineEvent::QuarterTick {
            quarter,
            game_day,
            real_time: now,
            performance,
        });
        Ok(quarter)
    }

    // -----------------------------------------------------------------------
    // Processing
    // -----------------------------------------------------------------------

    /// One pass over the five queues in strict priority order.
    pub(crate) async fn process_action_queues(self: &Arc<Self>) -> Result<usize, EngineError> {
        let slice = self.config.processing_time_slice();
        let started = Instant::now();
        let mut processed: usize = 0;

        for priority in Priority::ALL {
            let linger = slice.mul_f64(self.config.processing_priorities.get(priority).weight);
            while started.elapsed() < slice {
                let actions = lock(&self.queues).pop_batch(priority, self.config.batch_size);
                if actions.is_empty() {
                    break;
                }
                processed = processed.saturating_add(actions.len());
                self.process_batched_actions(actions).await?;
                if started.elapsed() >= linger {
                    break;
                }
            }
        }
        Ok(processed)
    }

    /// Batch popped actions and run the batches as parallel tasks.
    ///
    /// Player-scoped actions are keyed by the player's registered region,
    /// read here rather than at enqueue time, so all of one player's
    /// actions share a batch and run in queue order.
    async fn process_batched_actions(self: &Arc<Self>, mut actions: Vec<Action>) -> Result<(), EngineError> {
        {
            let registry = self.registry.read().await;
            for action in &mut actions {
                if let Some(player_id) = action.payload.player_id() {
                    action.region_id = registry.players.get(&player_id).map(|p| p.region_id.clone());
                }
            }
        }
        let mut batcher = IntelligentBatcher::new(&self.config.processing_priorities);
        for action in actions {
            batcher.add_action(action);
        }

        let mut tasks = JoinSet::new();
        for batch in batcher.drain() {
            let permit = Arc::clone(&self.dispatch_permits)
                .acquire_owned()
                .await
                .map_err(|e| EngineError::TaskFailed {
                    message: e.to_string(),
                })?;
            let inner = Arc::clone(self);
            tasks.spawn(async move {
                let _permit = permit;
                let size = batch.actions.len();
                inner.process_action_group(batch.key.kind, batch.actions).await;
                (batch.key, batch.deadline, size)
            });
        }

        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((key, deadline, size)) => {
                    if Instant::now() > deadline {
                        self.missed_batch_deadlines.fetch_add(1, Ordering::Relaxed);
                        debug!(batch = %key, size, "Batch finished after its deadline");
                    } else {
                        trace!(batch = %key, size, "Batch processed");
                    }
                }
                Err(e) => {
                    error!(error = %e, "Batch task failed");
                    failure.get_or_insert(EngineError::TaskFailed {
                        message: e.to_string(),
                    });
                }
            }
        }
        failure.map_or(Ok(()), Err)
    }

    fn record_pass(&self, processed: usize, elapsed: Duration) {
        let mut metrics = lock(&self.metrics);
        let ms = elapsed.as_secs_f64() * 1000.0;
        metrics.avg_tick_time_ms = metrics.avg_tick_time_ms.mul_add(1.0 - EMA_ALPHA, ms * EMA_ALPHA);
        metrics.processed_actions_total = metrics
            .processed_actions_total
            .saturating_add(u64::try_from(processed).unwrap_or(u64::MAX));
        #[allow(clippy::cast_precision_loss)]
        let count = processed as f64;
        metrics.processed_actions_per_second = count / elapsed.as_secs_f64().max(0.001);
    }

    /// Run one pass and decide how long to pause before the next.
    async fn processing_cycle(self: &Arc<Self>) -> Duration {
        let started = Instant::now();
        match self.process_action_queues().await {
            Ok(processed) => {
                self.record_pass(processed, started.elapsed());
                let backlog = lock(&self.queues).total();
                adaptive_sleep(backlog)
            }
            Err(e) => {
                error!(error = %e, "Processing pass failed");
                self.events.emit(EngineEvent::Error {
                    message: e.to_string(),
                });
                ERROR_COOLDOWN
            }
        }
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub(crate) fn cache_lookups(&self) -> u64 {
        lock(&self.cache).lookups()
    }

    fn performance_with_counts(&self, active: usize, total: usize) -> PerformanceSnapshot {
        let metrics = lock(&self.metrics).clone();
        let depths = lock(&self.queues).depths();
        let cache_hit_rate = lock(&self.cache).hit_rate();
        PerformanceSnapshot {
            avg_tick_time_ms: metrics.avg_tick_time_ms,
            processed_actions_per_second: metrics.processed_actions_per_second,
            processed_actions_total: metrics.processed_actions_total,
            ai_calls_this_quarter: self.ai.ai_calls_this_quarter(),
            rule_based_decisions_this_quarter: self.ai.rule_based_decisions_this_quarter(),
            cache_hit_rate,
            active_player_count: active,
            total_player_count: total,
            total_queued: depths.total(),
            queue_depths: depths,
            shed_actions: self.shed_actions.load(Ordering::Relaxed),
            missed_batch_deadlines: self.missed_batch_deadlines.load(Ordering::Relaxed),
        }
    }

    pub(crate) async fn performance(&self) -> PerformanceSnapshot {
        let (active, total) = {
            let registry = self.registry.read().await;
            (
                registry.count_active(Utc::now(), self.config.active_player_threshold()),
                registry.players.len(),
            )
        };
        self.performance_with_counts(active, total)
    }

    async fn game_state(&self) -> GameState {
        let now = Utc::now();
        let registry = self.registry.read().await;
        let active = registry.count_active(now, self.config.active_player_threshold());
        let total = registry.players.len();
        GameState {
            current_game_day: registry.clock.current_game_day(),
            current_quarter: registry.clock.current_quarter(),
            current_tick: registry.clock.current_tick(),
            total_players: total,
            active_players: active,
            running: self.is_running(),
            uptime_ms: if self.is_running() {
                u64::try_from(registry.clock.uptime(now).as_millis()).unwrap_or(u64::MAX)
            } else {
                0
            },
            regions: registry.shards.to_vec(),
            performance: self.performance_with_counts(active, total),
        }
    }

    async fn game_snapshot(&self) -> GameSnapshot {
        let now = Utc::now();
        let registry = self.registry.read().await;
        let active = registry.count_active(now, self.config.active_player_threshold());
        let players: Vec<Player> = registry.players.values().cloned().collect();
        GameSnapshot {
            saved_at: now,
            clock: registry.clock.snapshot(),
            performance: self.performance_with_counts(active, players.len()),
            players,
            civilizations: registry.civilizations.values().cloned().collect(),
            regions: registry.shards.to_vec(),
        }
    }

    /// Save the current state, and a durable snapshot when enough ticks
    /// have passed since the last one. Failures are logged.
    async fn auto_save(&self) {
        let snapshot = self.game_snapshot().await;
        if let Err(e) = self.store.save(&snapshot).await {
            error!(store = self.store.name(), error = %e, "Auto-save failed");
            return;
        }
        let tick = snapshot.clock.current_tick;
        let last = self.last_snapshot_tick.load(Ordering::Acquire);
        if tick.saturating_sub(last) >= self.config.ticks_per_snapshot() {
            match self.store.snapshot(&snapshot).await {
                Ok(()) => self.last_snapshot_tick.store(tick, Ordering::Release),
                Err(e) => error!(store = self.store.name(), tick, error = %e, "Snapshot failed"),
            }
        }
        debug!(tick, players = snapshot.players.len(), "Game state saved");
    }
}

// ---------------------------------------------------------------------------
// Background tasks
// ---------------------------------------------------------------------------

/// Run `on_tick` every `period`, first firing one period from now. Exits
/// when the engine stops or is dropped.
fn spawn_timer<F, Fut>(
    engine: Weak<EngineInner>,
    name: &'static str,
    period: Duration,
    on_tick: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<EngineInner>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let now = Instant::now();
        // The default burst behaviour catches up missed ticks, keeping the
        // count of days exact under load.
        let mut ticker = interval_at(now.checked_add(period).unwrap_or(now), period);
        loop {
            ticker.tick().await;
            let Some(inner) = engine.upgrade() else {
                break;
            };
            if !inner.is_running() {
                break;
            }
            on_tick(inner).await;
        }
        debug!(timer = name, "Timer stopped");
    })
}

async fn run_processing_loop(engine: Weak<EngineInner>, shutdown: Arc<Notify>) {
    loop {
        let pause = {
            let Some(inner) = engine.upgrade() else {
                break;
            };
            if !inner.is_running() {
                break;
            }
            inner.processing_cycle().await
        };
        tokio::select! {
            () = tokio::time::sleep(pause) => {}
            () = shutdown.notified() => {}
        }
    }
    debug!("Processing loop stopped");
}

// ---------------------------------------------------------------------------
// Public handle
// ---------------------------------------------------------------------------

/// Handle to a running (or runnable) simulation engine.
///
/// Clones share the same engine.
#[derive(Clone)]
pub struct ScalableSimulationEngine {
    inner: Arc<EngineInner>,
}

impl std::fmt::Debug for ScalableSimulationEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScalableSimulationEngine")
            .field("initialized", &self.is_initialized())
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl ScalableSimulationEngine {
    /// Create an engine with explicit collaborators.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] or [`EngineError::Clock`] if the
    /// configuration is unusable.
    pub fn new(
        config: EngineConfig,
        hooks: Arc<dyn EngineHooks>,
        model: DecisionModel,
        store: StateStore,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let clock = SimulationClock::new(config.day_tick_rate_ms, config.quarter_tick_rate_ms)?;
        let inner = EngineInner {
            registry: RwLock::new(Registry {
                clock,
                players: BTreeMap::new(),
                civilizations: BTreeMap::new(),
                shards: GalaxyShards::default(),
            }),
            queues: Mutex::new(PriorityQueues::new(&config.processing_priorities)),
            cache: Mutex::new(PredictiveCache::new(config.cache_size)),
            ai: AdaptiveAiProcessor::new(config.ai_processing_budget.clone(), model),
            hooks,
            store,
            events: EventBus::new(),
            metrics: Mutex::new(PassMetrics::default()),
            dispatch_permits: Arc::new(Semaphore::new(config.max_concurrency)),
            shed_actions: AtomicU64::new(0),
            missed_batch_deadlines: AtomicU64::new(0),
            monitor: PerformanceMonitor::new(config.metrics_interval(), config.cache_hit_rate_target),
            game_day: AtomicU64::new(0),
            last_snapshot_tick: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            running: AtomicBool::new(false),
            shutdown: Arc::new(Notify::new()),
            timers: Mutex::new(Vec::new()),
            processing_loop: Mutex::new(None),
            monitor_task: Mutex::new(None),
            config,
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Create an engine with no-op hooks, the simulated model, and a store
    /// chosen from `persistence.data_dir`.
    pub fn with_defaults(config: EngineConfig) -> Result<Self, EngineError> {
        let store = StateStore::from_data_dir(config.persistence.data_dir.as_deref());
        Self::new(config, Arc::new(NoOpHooks), DecisionModel::default(), store)
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Whether `initialize` has completed.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Whether timers and the processing loop are running.
    pub fn is_running(&self) -> bool {
        self.inner.is_running()
    }

    /// Subscribe to engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create the galaxy regions, log AI budgets and arm the performance
    /// monitor.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyInitialized`] on a second call.
    pub async fn initialize(&self) -> Result<(), EngineError> {
        if self.inner.initialized.swap(true, Ordering::AcqRel) {
            return Err(EngineError::AlreadyInitialized);
        }

        {
            let mut registry = self.inner.registry.write().await;
            registry.shards = GalaxyShards::with_default_regions(self.inner.config.players_per_shard);
            for region in registry.shards.iter() {
                debug!(region = %region.id, capacity = region.capacity, "Galaxy region created");
            }
        }

        self.inner.ai.initialize();
        let monitor = self.inner.monitor.start(Arc::downgrade(&self.inner));
        *lock(&self.inner.monitor_task) = Some(monitor);

        info!(
            day_tick_rate_ms = self.inner.config.day_tick_rate_ms,
            quarter_tick_rate_ms = self.inner.config.quarter_tick_rate_ms,
            target_max_players = self.inner.config.target_max_players,
            store = self.inner.store.name(),
            "Simulation engine initialized"
        );
        self.inner.events.emit(EngineEvent::Initialized);
        Ok(())
    }

    /// Anchor the clock, arm the day, quarter and auto-save timers, and
    /// launch the processing loop. Does nothing if already running.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotInitialized`] before `initialize`.
    pub async fn start(&self) -> Result<(), EngineError> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        if self.inner.running.swap(true, Ordering::AcqRel) {
            debug!("Engine already running");
            return Ok(());
        }

        self.inner.registry.write().await.clock.anchor(Utc::now());

        let config = &self.inner.config;
        let engine = Arc::downgrade(&self.inner);
        let timers = vec![
            spawn_timer(engine.clone(), "day", config.day_tick_rate(), |inner| async move {
                if let Err(e) = inner.process_day_tick().await {
                    error!(error = %e, "Day tick failed");
                    inner.events.emit(EngineEvent::Error {
                        message: e.to_string(),
                    });
                }
            }),
            spawn_timer(engine.clone(), "quarter", config.quarter_tick_rate(), |inner| async move {
                if let Err(e) = inner.process_quarter_tick().await {
                    error!(error = %e, "Quarter tick failed");
                    inner.events.emit(EngineEvent::Error {
                        message: e.to_string(),
                    });
                }
            }),
            spawn_timer(engine.clone(), "auto-save", config.auto_save_interval(), |inner| async move {
                inner.auto_save().await;
            }),
        ];
        *lock(&self.inner.timers) = timers;

        let processing = tokio::spawn(run_processing_loop(engine, Arc::clone(&self.inner.shutdown)));
        *lock(&self.inner.processing_loop) = Some(processing);

        info!(
            day_tick_rate_ms = config.day_tick_rate_ms,
            quarter_tick_rate_ms = config.quarter_tick_rate_ms,
            max_concurrency = config.max_concurrency,
            "Simulation engine started"
        );
        self.inner.events.emit(EngineEvent::Started);
        Ok(())
    }

    /// Cancel the timers, let the current processing pass finish, save,
    /// and emit `Stopped`. Does nothing if not running.
    pub async fn stop(&self) {
        if !self.inner.running.swap(false, Ordering::AcqRel) {
            return;
        }

        let timers = std::mem::take(&mut *lock(&self.inner.timers));
        for timer in &timers {
            timer.abort();
        }
        self.inner.shutdown.notify_one();
        let processing = lock(&self.inner.processing_loop).take();
        if let Some(handle) = processing
            && let Err(e) = handle.await
        {
            warn!(error = %e, "Processing loop ended abnormally");
        }

        self.inner.auto_save().await;
        info!("Simulation engine stopped");
        self.inner.events.emit(EngineEvent::Stopped);
    }

    /// Save the current state through the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Persist`] if the store fails.
    pub async fn save(&self) -> Result<(), EngineError> {
        let snapshot = self.inner.game_snapshot().await;
        self.inner.store.save(&snapshot).await?;
        Ok(())
    }

    /// Run one processing pass immediately, outside the loop. Returns the
    /// number of actions drained.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::TaskFailed`] if a batch task panicked.
    pub async fn run_processing_pass(&self) -> Result<usize, EngineError> {
        let started = Instant::now();
        let processed = self.inner.process_action_queues().await?;
        self.inner.record_pass(processed, started.elapsed());
        Ok(processed)
    }

    // -----------------------------------------------------------------------
    // Players and civilizations
    // -----------------------------------------------------------------------

    /// Register a player in the least-loaded region with spare capacity.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotInitialized`] before `initialize`.
    /// - [`EngineError::InvalidPlayer`] for a blank name.
    /// - [`EngineError::DuplicatePlayer`] for a reused id.
    /// - [`EngineError::CapacityReached`] when the hard limit is reached or
    ///   every region is full.
    pub async fn add_player(&self, request: NewPlayer) -> Result<Player, EngineError> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        let name = request.name.trim();
        if name.is_empty() {
            return Err(EngineError::InvalidPlayer {
                reason: "name must not be empty".to_owned(),
            });
        }

        let config = &self.inner.config;
        let (player, total) = {
            let mut guard = self.inner.registry.write().await;
            let registry = &mut *guard;
            let id = request.id.unwrap_or_default();
            if registry.players.contains_key(&id) {
                return Err(EngineError::DuplicatePlayer { player_id: id });
            }
            if registry.players.len() >= config.target_max_players {
                return Err(EngineError::CapacityReached {
                    limit: config.target_max_players,
                });
            }
            let region_id = registry
                .shards
                .assign_optimal_region()
                .ok_or(EngineError::CapacityReached {
                    limit: registry.players.len(),
                })?;

            let now = Utc::now();
            let player = Player {
                id,
                name: name.to_owned(),
                player_type: request.player_type,
                importance: request.importance,
                region_id: region_id.clone(),
                civilization_id: request.civilization_id,
                session_id: request.session_id,
                connected: true,
                ai_tier: AiTier::for_player(request.player_type, request.importance),
                joined_at: now,
                last_activity: now,
                action_count: 0,
                last_action_time: now,
                average_action_interval_ms: 0.0,
            };

            registry.shards.add_player(&region_id);
            if let Some(civilization_id) = request.civilization_id {
                match registry.civilizations.get_mut(&civilization_id) {
                    Some(civilization) => {
                        if !civilization.owners.contains(&id) {
                            civilization.owners.push(id);
                        }
                    }
                    None => {
                        registry.shards.add_civilization(&region_id);
                        registry.civilizations.insert(
                            civilization_id,
                            Civilization {
                                id: civilization_id,
                                region_id,
                                owners: vec![id],
                                created_at: now,
                                attributes: serde_json::Map::new(),
                            },
                        );
                    }
                }
            }
            registry.players.insert(id, player.clone());
            (player, registry.players.len())
        };

        if total > config.max_players {
            warn!(
                total_players = total,
                max_players = config.max_players,
                "Player count exceeds the soft limit"
            );
        }
        info!(
            player_id = %player.id,
            name = %player.name,
            player_type = ?player.player_type,
            region = %player.region_id,
            tier = %player.ai_tier,
            "Player added"
        );
        self.inner.events.emit(EngineEvent::PlayerAdded {
            player: player.clone(),
        });
        Ok(player)
    }

    /// Unregister a player. Returns `None` for unknown ids.
    pub async fn remove_player(&self, player_id: PlayerId) -> Option<Player> {
        let removed = {
            let mut guard = self.inner.registry.write().await;
            let registry = &mut *guard;
            let player = registry.players.remove(&player_id)?;
            registry.shards.remove_player(&player.region_id);
            if let Some(civilization_id) = player.civilization_id
                && let Some(civilization) = registry.civilizations.get_mut(&civilization_id)
            {
                civilization.owners.retain(|owner| *owner != player_id);
                // A civilization goes with its last owner.
                if civilization.owners.is_empty()
                    && let Some(orphan) = registry.civilizations.remove(&civilization_id)
                {
                    registry.shards.remove_civilization(&orphan.region_id);
                    debug!(civilization_id = %civilization_id, region = %orphan.region_id, "Civilization removed");
                }
            }
            player
        };
        info!(player_id = %player_id, region = %removed.region_id, "Player removed");
        self.inner.events.emit(EngineEvent::PlayerRemoved { player_id });
        Some(removed)
    }

    /// Register a civilization that no player owns yet. Without a region
    /// it goes to the least-loaded one.
    ///
    /// # Errors
    ///
    /// - [`EngineError::NotInitialized`] before `initialize`.
    /// - [`EngineError::DuplicateCivilization`] for a reused id.
    /// - [`EngineError::UnknownRegion`] for a region that does not exist.
    pub async fn register_civilization(
        &self,
        civilization_id: CivilizationId,
        region_id: Option<RegionId>,
        attributes: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Civilization, EngineError> {
        if !self.is_initialized() {
            return Err(EngineError::NotInitialized);
        }
        let mut guard = self.inner.registry.write().await;
        let registry = &mut *guard;
        if registry.civilizations.contains_key(&civilization_id) {
            return Err(EngineError::DuplicateCivilization { civilization_id });
        }
        let region_id = match region_id {
            Some(region_id) if registry.shards.get(&region_id).is_some() => region_id,
            Some(region_id) => return Err(EngineError::UnknownRegion { region_id }),
            None => registry
                .shards
                .least_loaded_region()
                .ok_or(EngineError::NotInitialized)?,
        };
        registry.shards.add_civilization(&region_id);
        let civilization = Civilization {
            id: civilization_id,
            region_id,
            owners: Vec::new(),
            created_at: Utc::now(),
            attributes,
        };
        registry.civilizations.insert(civilization_id, civilization.clone());
        drop(guard);
        debug!(civilization_id = %civilization_id, region = %civilization.region_id, "Civilization registered");
        Ok(civilization)
    }

    // -----------------------------------------------------------------------
    // Actions
    // -----------------------------------------------------------------------

    /// Queue an action. A missing priority means `medium`; an unknown one
    /// is logged and dropped; a full queue sheds the action.
    pub fn queue_action(&self, request: ActionRequest) -> EnqueueOutcome {
        let priority = match request.priority.as_deref() {
            None => Priority::default(),
            Some(name) => match name.parse::<Priority>() {
                Ok(priority) => priority,
                Err(e) => {
                    warn!(
                        priority = %e.0,
                        kind = %request.payload.kind(),
                        "Unknown priority, action dropped"
                    );
                    return EnqueueOutcome::UnknownPriority { name: e.0 };
                }
            },
        };
        let region_id = request.region_id.or_else(|| payload_region(&request.payload));
        self.inner.enqueue(priority, region_id, request.payload)
    }

    /// Queue a typed action.
    pub fn queue(&self, priority: Priority, payload: ActionPayload) -> EnqueueOutcome {
        let region_id = payload_region(&payload);
        self.inner.enqueue(priority, region_id, payload)
    }

    // -----------------------------------------------------------------------
    // Read models
    // -----------------------------------------------------------------------

    /// Snapshot of the whole game.
    pub async fn game_state(&self) -> GameState {
        self.inner.game_state().await
    }

    /// Snapshot of one player's game. `None` for unknown players.
    pub async fn player_game_state(&self, player_id: PlayerId) -> Option<PlayerGameState> {
        let (player, region) = {
            let registry = self.inner.registry.read().await;
            let player = registry.players.get(&player_id)?.clone();
            let region = registry.shards.get(&player.region_id).cloned();
            (player, region)
        };
        Some(PlayerGameState {
            tier_budget_remaining: self.inner.ai.remaining_budget(player.ai_tier),
            player,
            region,
            game: self.inner.game_state().await,
        })
    }

    /// Current performance counters.
    pub async fn performance(&self) -> PerformanceSnapshot {
        self.inner.performance().await
    }

    /// Remaining AI budget of a tier this quarter.
    pub fn remaining_ai_budget(&self, tier: AiTier) -> u32 {
        self.inner.ai.remaining_budget(tier)
    }

    /// Region state in creation order.
    pub async fn regions(&self) -> Vec<GalaxyRegion> {
        self.inner.registry.read().await.shards.to_vec()
    }

    /// A registered player.
    pub async fn player(&self, player_id: PlayerId) -> Option<Player> {
        self.inner.registry.read().await.players.get(&player_id).cloned()
    }
}

impl Drop for EngineInner {
    fn drop(&mut self) {
        for timer in lock(&self.timers).iter() {
            timer.abort();
        }
        if let Some(monitor) = lock(&self.monitor_task).take() {
            monitor.abort();
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures::FutureExt;
    use futures::future::{self, BoxFuture};
    use galactic_types::{
        AiDecisionPayload, DecisionMethod, Importance, PlayerActionPayload, PlayerType,
    };

    use super::*;
    use crate::ai::SimulatedModel;
    use crate::hooks::HookError;
    use crate::persist::JsonFileStore;

    /// Records what the dispatcher hands to the domain.
    #[derive(Default)]
    struct RecordingHooks {
        commands: Mutex<Vec<String>>,
        decisions: Mutex<Vec<Decision>>,
    }

    impl EngineHooks for RecordingHooks {
        fn on_player_action<'a>(
            &'a self,
            _player: &'a Player,
            action: &'a PlayerActionPayload,
        ) -> BoxFuture<'a, Result<(), HookError>> {
            self.commands.lock().unwrap().push(action.command.clone());
            let result = if action.command == "self-destruct" {
                Err(HookError::Rejected {
                    reason: "not allowed".to_owned(),
                })
            } else {
                Ok(())
            };
            future::ready(result).boxed()
        }

        fn on_decision<'a>(&'a self, decision: &'a Decision) -> BoxFuture<'a, Result<(), HookError>> {
            self.decisions.lock().unwrap().push(decision.clone());
            future::ready(Ok(())).boxed()
        }
    }

    /// Records commands after pausing on the slow one, or on every
    /// command when none is named.
    struct PacedHooks {
        delay: Duration,
        slow_command: Option<&'static str>,
        commands: Mutex<Vec<String>>,
    }

    impl PacedHooks {
        fn new(delay: Duration, slow_command: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                delay,
                slow_command,
                commands: Mutex::new(Vec::new()),
            })
        }
    }

    impl EngineHooks for PacedHooks {
        fn on_player_action<'a>(
            &'a self,
            _player: &'a Player,
            action: &'a PlayerActionPayload,
        ) -> BoxFuture<'a, Result<(), HookError>> {
            async move {
                if self.slow_command.is_none_or(|slow| slow == action.command) {
                    tokio::time::sleep(self.delay).await;
                }
                self.commands.lock().unwrap().push(action.command.clone());
                Ok(())
            }
            .boxed()
        }
    }

    async fn initialized_paced(config: EngineConfig, hooks: &Arc<PacedHooks>) -> ScalableSimulationEngine {
        let engine = ScalableSimulationEngine::new(
            config,
            Arc::clone(hooks) as Arc<dyn EngineHooks>,
            instant_model(),
            StateStore::Null,
        )
        .unwrap();
        engine.initialize().await.unwrap();
        engine
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            day_tick_rate_ms: 100,
            quarter_tick_rate_ms: 900,
            ..EngineConfig::default()
        }
    }

    fn instant_model() -> DecisionModel {
        DecisionModel::Simulated(SimulatedModel::with_latency(Duration::ZERO))
    }

    async fn initialized_with(
        config: EngineConfig,
        model: DecisionModel,
    ) -> (ScalableSimulationEngine, Arc<RecordingHooks>) {
        let hooks = Arc::new(RecordingHooks::default());
        let engine =
            ScalableSimulationEngine::new(config, Arc::clone(&hooks) as Arc<dyn EngineHooks>, model, StateStore::Null)
                .unwrap();
        engine.initialize().await.unwrap();
        (engine, hooks)
    }

    async fn initialized(config: EngineConfig) -> (ScalableSimulationEngine, Arc<RecordingHooks>) {
        initialized_with(config, instant_model()).await
    }

    fn human(name: &str) -> NewPlayer {
        NewPlayer::named(name, PlayerType::Human)
    }

    fn ai(name: &str) -> NewPlayer {
        NewPlayer::named(name, PlayerType::Ai)
    }

    fn command(player_id: PlayerId, command: &str) -> ActionPayload {
        ActionPayload::PlayerAction(PlayerActionPayload {
            player_id,
            command: command.to_owned(),
            params: serde_json::Value::Null,
        })
    }

    fn decision_request(player_id: PlayerId, context: &str) -> ActionPayload {
        ActionPayload::AiDecision(AiDecisionPayload {
            player_id,
            context: context.to_owned(),
        })
    }

    fn count_methods(decisions: &[Decision], method: DecisionMethod) -> usize {
        decisions.iter().filter(|d| d.method == method).count()
    }

    #[test]
    fn sleep_shrinks_with_backlog() {
        assert_eq!(adaptive_sleep(0), Duration::from_millis(50));
        assert_eq!(adaptive_sleep(100), Duration::from_millis(50));
        assert_eq!(adaptive_sleep(101), Duration::from_millis(10));
        assert_eq!(adaptive_sleep(1001), Duration::from_millis(1));
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn initialize_twice_fails() {
        let (engine, _) = initialized(test_config()).await;
        assert!(matches!(engine.initialize().await, Err(EngineError::AlreadyInitialized)));
        assert_eq!(engine.regions().await.len(), 4);
    }

    #[tokio::test]
    async fn start_requires_initialize() {
        let engine = ScalableSimulationEngine::with_defaults(test_config()).unwrap();
        assert!(matches!(engine.start().await, Err(EngineError::NotInitialized)));
        assert!(!engine.is_running());
        assert!(matches!(
            engine.add_player(human("Alice")).await,
            Err(EngineError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let config = EngineConfig {
            batch_size: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            ScalableSimulationEngine::with_defaults(config),
            Err(EngineError::Config { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn timers_drive_days_and_quarters() {
        let (engine, _) = initialized(test_config()).await;
        let mut rx = engine.subscribe();
        engine.start().await.unwrap();
        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1050)).await;
        engine.stop().await;
        engine.stop().await;

        let state = engine.game_state().await;
        assert!((9..=11).contains(&state.current_game_day), "day {}", state.current_game_day);
        assert_eq!(state.current_quarter, 1);
        assert!(!state.running);

        let mut day_ticks = 0;
        let mut quarter_ticks = 0;
        let mut started = 0;
        let mut stopped = 0;
        while let Ok(event) = rx.try_recv() {
            match event {
                EngineEvent::DayTick { .. } => day_ticks += 1,
                EngineEvent::QuarterTick { .. } => quarter_ticks += 1,
                EngineEvent::Started => started += 1,
                EngineEvent::Stopped => stopped += 1,
                _ => {}
            }
        }
        assert!((9..=11).contains(&day_ticks));
        assert_eq!(quarter_ticks, 1);
        assert_eq!(started, 1);
        assert_eq!(stopped, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn day_ticks_advance_while_queues_are_full() {
        let mut config = test_config();
        config.batch_size = 10;
        config.ai_processing_budget.tier3 = 100_000;
        let (engine, _) = initialized_with(config, DecisionModel::default()).await;
        let bob = engine.add_player(ai("Bob")).await.unwrap();
        for i in 0..5000 {
            let outcome = engine.queue(Priority::Low, decision_request(bob.id, &format!("sector {i}")));
            assert!(outcome.is_queued());
        }

        engine.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(550)).await;
        let state = engine.game_state().await;
        engine.stop().await;

        assert!(state.current_game_day >= 5, "day {}", state.current_game_day);
        assert!(state.performance.total_queued > 1000);
    }

    // -----------------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn tiers_follow_player_type_and_importance() {
        let (engine, _) = initialized(test_config()).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        let bob = engine.add_player(ai("Bob")).await.unwrap();
        let carol = engine
            .add_player(NewPlayer {
                importance: Importance::High,
                ..ai("Carol")
            })
            .await
            .unwrap();
        assert_eq!(alice.ai_tier, AiTier::Tier1);
        assert_eq!(bob.ai_tier, AiTier::Tier3);
        assert_eq!(carol.ai_tier, AiTier::Tier2);
    }

    #[tokio::test]
    async fn placement_prefers_lowest_load_then_first_region() {
        let (engine, _) = initialized(test_config()).await;
        let mut regions = Vec::new();
        for name in ["A", "B", "C", "D", "E"] {
            regions.push(engine.add_player(human(name)).await.unwrap().region_id);
        }
        let slugs: Vec<&str> = regions.iter().map(RegionId::as_str).collect();
        assert_eq!(
            slugs,
            vec!["core-worlds", "mid-rim", "outer-rim", "unknown-regions", "core-worlds"]
        );
    }

    #[tokio::test]
    async fn civilizations_count_towards_load() {
        let (engine, _) = initialized(test_config()).await;
        engine
            .register_civilization(
                CivilizationId::new(),
                Some(RegionId::new("core-worlds")),
                serde_json::Map::new(),
            )
            .await
            .unwrap();
        let alice = engine.add_player(human("Alice")).await.unwrap();
        assert_eq!(alice.region_id.as_str(), "mid-rim");

        let missing = engine
            .register_civilization(CivilizationId::new(), Some(RegionId::new("deep-core")), serde_json::Map::new())
            .await;
        assert!(matches!(missing, Err(EngineError::UnknownRegion { .. })));
    }

    #[tokio::test]
    async fn player_civilization_is_registered_once() {
        let (engine, _) = initialized(test_config()).await;
        let civilization_id = CivilizationId::new();
        let alice = engine
            .add_player(NewPlayer {
                civilization_id: Some(civilization_id),
                ..human("Alice")
            })
            .await
            .unwrap();
        engine
            .add_player(NewPlayer {
                civilization_id: Some(civilization_id),
                ..human("Bob")
            })
            .await
            .unwrap();
        let regions = engine.regions().await;
        let civilizations: u32 = regions.iter().map(|r| r.civilization_count).sum();
        assert_eq!(civilizations, 1);
        let home = regions.iter().find(|r| r.id == alice.region_id).unwrap();
        assert_eq!(home.civilization_count, 1);
    }

    #[tokio::test]
    async fn malformed_and_duplicate_players_are_rejected() {
        let (engine, _) = initialized(test_config()).await;
        assert!(matches!(
            engine.add_player(human("   ")).await,
            Err(EngineError::InvalidPlayer { .. })
        ));
        let alice = engine.add_player(human("Alice")).await.unwrap();
        let duplicate = NewPlayer {
            id: Some(alice.id),
            ..human("Alice again")
        };
        assert!(matches!(
            engine.add_player(duplicate).await,
            Err(EngineError::DuplicatePlayer { .. })
        ));
        assert_eq!(engine.game_state().await.total_players, 1);
    }

    #[tokio::test]
    async fn hard_limit_is_enforced() {
        let config = EngineConfig {
            target_max_players: 2,
            max_players: 1,
            ..test_config()
        };
        let (engine, _) = initialized(config).await;
        engine.add_player(human("A")).await.unwrap();
        engine.add_player(human("B")).await.unwrap();
        assert!(matches!(
            engine.add_player(human("C")).await,
            Err(EngineError::CapacityReached { limit: 2 })
        ));
    }

    #[tokio::test]
    async fn full_regions_reject_players() {
        let config = EngineConfig {
            players_per_shard: 1,
            ..test_config()
        };
        let (engine, _) = initialized(config).await;
        for name in ["A", "B", "C", "D"] {
            engine.add_player(human(name)).await.unwrap();
        }
        assert!(matches!(
            engine.add_player(human("E")).await,
            Err(EngineError::CapacityReached { .. })
        ));
    }

    #[tokio::test]
    async fn remove_player_releases_region_slot() {
        let (engine, _) = initialized(test_config()).await;
        let mut rx = engine.subscribe();
        let alice = engine.add_player(human("Alice")).await.unwrap();
        assert!(matches!(rx.recv().await.unwrap(), EngineEvent::PlayerAdded { .. }));

        let removed = engine.remove_player(alice.id).await.unwrap();
        assert_eq!(removed.id, alice.id);
        assert_eq!(
            rx.recv().await.unwrap(),
            EngineEvent::PlayerRemoved { player_id: alice.id }
        );
        assert!(engine.regions().await.iter().all(|r| r.player_count == 0));
        assert!(engine.remove_player(alice.id).await.is_none());
        assert!(engine.player_game_state(alice.id).await.is_none());
    }

    #[tokio::test]
    async fn last_owner_takes_civilization_along() {
        let (engine, _) = initialized(test_config()).await;
        let civilization_id = CivilizationId::new();
        let with_civilization = |name: &str| NewPlayer {
            civilization_id: Some(civilization_id),
            ..human(name)
        };
        let alice = engine.add_player(with_civilization("Alice")).await.unwrap();
        let bob = engine.add_player(with_civilization("Bob")).await.unwrap();
        let civilizations = |regions: &[GalaxyRegion]| regions.iter().map(|r| r.civilization_count).sum::<u32>();

        engine.remove_player(alice.id).await.unwrap();
        assert_eq!(civilizations(&engine.regions().await), 1);
        engine.remove_player(bob.id).await.unwrap();
        assert_eq!(civilizations(&engine.regions().await), 0);

        // Every region is empty again, so placement starts over at the first.
        let carol = engine.add_player(human("Carol")).await.unwrap();
        assert_eq!(carol.region_id.as_str(), "core-worlds");
    }

    #[tokio::test]
    async fn player_game_state_includes_region_and_budget() {
        let (engine, _) = initialized(test_config()).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        let state = engine.player_game_state(alice.id).await.unwrap();
        assert_eq!(state.player.name, "Alice");
        assert_eq!(state.region.unwrap().id, alice.region_id);
        assert_eq!(state.tier_budget_remaining, 20);
        assert_eq!(state.game.total_players, 1);
        assert_eq!(state.game.active_players, 1);
    }

    // -----------------------------------------------------------------------
    // Queueing and dispatch
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn unknown_priority_is_dropped() {
        let (engine, _) = initialized(test_config()).await;
        let outcome = engine.queue_action(ActionRequest::with_priority_name(
            "urgent",
            command(PlayerId::new(), "scan"),
        ));
        assert_eq!(
            outcome,
            EnqueueOutcome::UnknownPriority {
                name: "urgent".to_owned()
            }
        );
        assert_eq!(engine.performance().await.total_queued, 0);
    }

    #[tokio::test]
    async fn missing_priority_means_medium() {
        let (engine, _) = initialized(test_config()).await;
        let outcome = engine.queue_action(ActionRequest {
            priority: None,
            region_id: None,
            payload: command(PlayerId::new(), "scan"),
        });
        assert!(matches!(
            outcome,
            EnqueueOutcome::Queued {
                priority: Priority::Medium,
                depth: 1,
                ..
            }
        ));
        assert_eq!(engine.performance().await.queue_depths.medium, 1);
    }

    #[tokio::test]
    async fn full_queue_sheds_new_actions() {
        let mut config = test_config();
        config.processing_priorities.critical.capacity = 2;
        let (engine, _) = initialized(config).await;
        let player_id = PlayerId::new();
        assert!(engine.queue(Priority::Critical, command(player_id, "a")).is_queued());
        assert!(engine.queue(Priority::Critical, command(player_id, "b")).is_queued());
        assert_eq!(
            engine.queue(Priority::Critical, command(player_id, "c")),
            EnqueueOutcome::Shed {
                priority: Priority::Critical
            }
        );
        let performance = engine.performance().await;
        assert_eq!(performance.shed_actions, 1);
        assert_eq!(performance.queue_depths.critical, 2);
    }

    #[tokio::test]
    async fn critical_actions_drain_before_batch_actions() {
        let (engine, hooks) = initialized(test_config()).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        for i in 0..5 {
            engine.queue(Priority::Batch, command(alice.id, &format!("batch-{i}")));
        }
        for i in 0..5 {
            engine.queue(Priority::Critical, command(alice.id, &format!("critical-{i}")));
        }

        assert_eq!(engine.run_processing_pass().await.unwrap(), 10);

        let commands = hooks.commands.lock().unwrap().clone();
        let expected: Vec<String> = (0..5)
            .map(|i| format!("critical-{i}"))
            .chain((0..5).map(|i| format!("batch-{i}")))
            .collect();
        assert_eq!(commands, expected);
        let alice = engine.player(alice.id).await.unwrap();
        assert_eq!(alice.action_count, 10);
        assert_eq!(engine.performance().await.processed_actions_total, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn tiny_time_slice_finishes_critical_work_before_batch_work() {
        let hooks = PacedHooks::new(Duration::from_millis(2), None);
        let config = EngineConfig {
            processing_time_slice_ms: 1,
            batch_size: 5,
            ..test_config()
        };
        let engine = initialized_paced(config, &hooks).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        for i in 0..5 {
            engine.queue(Priority::Batch, command(alice.id, &format!("batch-{i}")));
        }
        for i in 0..10 {
            engine.queue(Priority::Critical, command(alice.id, &format!("critical-{i}")));
        }

        // Every batch outlasts the slice, so each pass handles exactly one.
        let mut passes = Vec::new();
        while engine.performance().await.total_queued > 0 {
            passes.push(engine.run_processing_pass().await.unwrap());
        }
        assert_eq!(passes, [5, 5, 5]);

        let commands = hooks.commands.lock().unwrap().clone();
        let expected: Vec<String> = (0..10)
            .map(|i| format!("critical-{i}"))
            .chain((0..5).map(|i| format!("batch-{i}")))
            .collect();
        assert_eq!(commands, expected);
    }

    #[tokio::test]
    async fn requested_region_does_not_split_a_players_actions() {
        let hooks = PacedHooks::new(Duration::from_millis(20), Some("first"));
        let config = EngineConfig {
            max_concurrency: 4,
            ..test_config()
        };
        let engine = initialized_paced(config, &hooks).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        assert_eq!(alice.region_id.as_str(), "core-worlds");

        engine.queue_action(ActionRequest {
            priority: Some("critical".to_owned()),
            region_id: Some(RegionId::new("outer-rim")),
            payload: command(alice.id, "first"),
        });
        engine.queue(Priority::Critical, command(alice.id, "second"));
        assert_eq!(engine.run_processing_pass().await.unwrap(), 2);

        assert_eq!(*hooks.commands.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn actions_queued_during_registry_writes_keep_player_order() {
        let hooks = PacedHooks::new(Duration::from_millis(20), Some("first"));
        let config = EngineConfig {
            max_concurrency: 4,
            ..test_config()
        };
        let engine = initialized_paced(config, &hooks).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        {
            let _busy = engine.inner.registry.write().await;
            engine.queue(Priority::Critical, command(alice.id, "first"));
        }
        engine.queue(Priority::Critical, command(alice.id, "second"));
        assert_eq!(engine.run_processing_pass().await.unwrap(), 2);

        assert_eq!(*hooks.commands.lock().unwrap(), ["first", "second"]);
    }

    #[tokio::test]
    async fn failing_action_does_not_stop_the_batch() {
        let (engine, hooks) = initialized(test_config()).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        for name in ["scan", "self-destruct", "build"] {
            engine.queue(Priority::Critical, command(alice.id, name));
        }
        engine.run_processing_pass().await.unwrap();
        assert_eq!(hooks.commands.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn actions_for_unknown_players_are_dropped() {
        let (engine, hooks) = initialized(test_config()).await;
        engine.queue(Priority::Critical, command(PlayerId::new(), "scan"));
        engine.run_processing_pass().await.unwrap();
        assert!(hooks.commands.lock().unwrap().is_empty());
        assert_eq!(engine.performance().await.total_queued, 0);
    }

    // -----------------------------------------------------------------------
    // AI budgets
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn exhausted_budget_answers_everything_with_rules() {
        let mut config = test_config();
        config.ai_processing_budget.tier3 = 0;
        let (engine, hooks) = initialized(config).await;
        let bob = engine.add_player(ai("Bob")).await.unwrap();
        for i in 0..10 {
            engine.queue(Priority::Medium, decision_request(bob.id, &format!("situation {i}")));
        }
        engine.run_processing_pass().await.unwrap();

        let decisions = hooks.decisions.lock().unwrap().clone();
        assert_eq!(decisions.len(), 10);
        assert_eq!(count_methods(&decisions, DecisionMethod::Rules), 10);
        let mut ids: Vec<ActionId> = decisions.iter().map(|d| d.action_id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }

    #[tokio::test]
    async fn budget_splits_requests_between_model_and_rules() {
        let mut config = test_config();
        config.ai_processing_budget.tier1 = 2;
        let (engine, hooks) = initialized(config).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        for i in 0..5 {
            engine.queue(Priority::Medium, decision_request(alice.id, &format!("front {i}")));
        }
        engine.run_processing_pass().await.unwrap();

        let decisions = hooks.decisions.lock().unwrap().clone();
        assert_eq!(decisions.len(), 5);
        assert_eq!(count_methods(&decisions, DecisionMethod::Ai), 2);
        assert_eq!(count_methods(&decisions, DecisionMethod::Rules), 3);
        assert_eq!(engine.remaining_ai_budget(AiTier::Tier1), 0);

        let region = engine
            .regions()
            .await
            .into_iter()
            .find(|r| r.id == alice.region_id)
            .unwrap();
        assert!(region.ai_processing_load > 0.0);
    }

    #[tokio::test]
    async fn cached_answers_do_not_spend_budget() {
        let mut config = test_config();
        config.ai_processing_budget.tier1 = 5;
        let (engine, hooks) = initialized(config).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();

        engine.queue(Priority::Medium, decision_request(alice.id, "pirates at the gate"));
        engine.run_processing_pass().await.unwrap();
        engine.queue(Priority::Medium, decision_request(alice.id, "pirates at the gate"));
        engine.run_processing_pass().await.unwrap();

        let decisions = hooks.decisions.lock().unwrap().clone();
        assert_eq!(decisions[0].method, DecisionMethod::Ai);
        assert_eq!(decisions[1].method, DecisionMethod::Cached);
        assert_eq!(decisions[1].decision, decisions[0].decision);
        assert_ne!(decisions[1].action_id, decisions[0].action_id);
        assert_eq!(engine.remaining_ai_budget(AiTier::Tier1), 4);
        assert!(engine.performance().await.cache_hit_rate > 0.0);
    }

    // -----------------------------------------------------------------------
    // Clock ticks
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn day_tick_queues_daily_work() {
        let (engine, _) = initialized(test_config()).await;
        let mut rx = engine.subscribe();
        assert_eq!(engine.inner.process_day_tick().await.unwrap(), 1);
        assert!(matches!(
            rx.recv().await.unwrap(),
            EngineEvent::DayTick { game_day: 1, .. }
        ));
        assert_eq!(engine.performance().await.queue_depths.high, 1);
        assert_eq!(engine.game_state().await.current_tick, 1);
    }

    #[tokio::test]
    async fn quarter_tick_resets_budgets_before_announcing() {
        let mut config = test_config();
        config.ai_processing_budget.tier1 = 3;
        let (engine, _) = initialized(config).await;
        let alice = engine.add_player(human("Alice")).await.unwrap();
        for i in 0..3 {
            engine.queue(Priority::Medium, decision_request(alice.id, &format!("deal {i}")));
        }
        engine.run_processing_pass().await.unwrap();
        assert_eq!(engine.remaining_ai_budget(AiTier::Tier1), 0);

        let mut rx = engine.subscribe();
        engine.inner.process_quarter_tick().await.unwrap();
        let EngineEvent::QuarterTick {
            quarter,
            performance,
            ..
        } = rx.recv().await.unwrap()
        else {
            panic!("expected a quarter tick");
        };
        assert_eq!(quarter, 1);
        assert_eq!(performance.ai_calls_this_quarter["tier1"], 3);
        assert_eq!(engine.remaining_ai_budget(AiTier::Tier1), 3);

        let after = engine.performance().await;
        assert_eq!(after.ai_calls_this_quarter["tier1"], 0);
        assert_eq!(after.queue_depths.batch, 1);
        assert!(
            engine
                .regions()
                .await
                .iter()
                .all(|r| r.ai_processing_load.abs() < f64::EPSILON)
        );
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn save_writes_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScalableSimulationEngine::new(
            test_config(),
            Arc::new(NoOpHooks),
            DecisionModel::Disabled,
            StateStore::JsonFile(JsonFileStore::new(dir.path())),
        )
        .unwrap();
        engine.initialize().await.unwrap();
        engine.add_player(human("Alice")).await.unwrap();
        engine.save().await.unwrap();

        let json = std::fs::read_to_string(dir.path().join("state.json")).unwrap();
        let saved: GameSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(saved.players.len(), 1);
        assert_eq!(saved.regions.len(), 4);
    }
}
