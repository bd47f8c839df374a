//! Tick Scheduler
//!
//! Drives a `RunSession` in real time. One spawned task owns the session
//! and serializes everything that touches it: timer ticks, player
//! commands and persistence outcomes all go through the same `select!`,
//! so a tick never runs concurrently with a claim or a restart.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::core::grid::Direction;
use crate::game::events::GameEvent;
use crate::game::relic::RelicKind;
use crate::game::snapshot::RenderSnapshot;
use crate::game::tick::{GameOverReport, RunRules};
use crate::meta::client::MetaClient;
use crate::meta::store::MetaStore;
use crate::session::report::report_game_over;
use crate::session::run::{RunSession, SessionError};

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base seed mixed into every run seed
    pub base_seed: u64,
    /// Capacity of the update broadcast
    pub snapshot_buffer: usize,
    /// Command queue depth
    pub command_buffer: usize,
    /// Simulation rules
    pub rules: RunRules,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_seed: random_seed(),
            snapshot_buffer: 64,
            command_buffer: 32,
            rules: RunRules::default(),
        }
    }
}

impl SessionConfig {
    /// Create config from environment variables.
    ///
    /// `CRYPT_SNAKE_SEED` pins the base seed; unset or unparsable means a
    /// fresh random one.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_seed: std::env::var("CRYPT_SNAKE_SEED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.base_seed),
            snapshot_buffer: std::env::var("CRYPT_SNAKE_SNAPSHOT_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.snapshot_buffer),
            ..defaults
        }
    }
}

fn random_seed() -> u64 {
    Uuid::new_v4().as_u64_pair().0
}

// =============================================================================
// TIMER
// =============================================================================

/// Repeating tick timer whose period can be swapped mid-run.
///
/// A paused timer never fires. Swapping or resuming restarts the period,
/// so the next tick lands one full interval later.
pub struct TickTimer {
    period_ms: u64,
    interval: Option<Interval>,
}

impl TickTimer {
    /// A running timer.
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            interval: Some(build_interval(period_ms)),
        }
    }

    /// A timer that waits for `resume`.
    pub fn paused(period_ms: u64) -> Self {
        Self {
            period_ms,
            interval: None,
        }
    }

    /// Swap to a new period. Returns `false` if it was already in force.
    pub fn reschedule(&mut self, period_ms: u64) -> bool {
        if period_ms == self.period_ms {
            return false;
        }
        self.period_ms = period_ms;
        if self.interval.is_some() {
            self.interval = Some(build_interval(period_ms));
        }
        true
    }

    /// Stop firing.
    pub fn pause(&mut self) {
        self.interval = None;
    }

    /// Start firing again.
    pub fn resume(&mut self) {
        if self.interval.is_none() {
            self.interval = Some(build_interval(self.period_ms));
        }
    }

    /// Fire a full `period_ms` from now, discarding any partial period.
    pub fn restart(&mut self, period_ms: u64) {
        self.period_ms = period_ms;
        self.interval = Some(build_interval(period_ms));
    }

    /// Current period (ms).
    pub fn period_ms(&self) -> u64 {
        self.period_ms
    }

    /// Is the timer paused?
    pub fn is_paused(&self) -> bool {
        self.interval.is_none()
    }

    /// Wait for the next tick.
    pub async fn wait(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

fn build_interval(period_ms: u64) -> Interval {
    let period = Duration::from_millis(period_ms.max(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

// =============================================================================
// MESSAGES
// =============================================================================

/// Commands into the session task.
#[derive(Debug)]
pub enum SessionCommand {
    /// Start or restart a run
    Start,
    /// Queue a turn
    Turn(Direction),
    /// Claim an offered relic
    ClaimRelic {
        index: usize,
        reply: oneshot::Sender<Result<RelicKind, SessionError>>,
    },
    /// Decline the offer
    DeclineRelic {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    /// Flash a message over the board
    Status(String),
    /// Stop the session
    Shutdown,
}

/// Updates broadcast from the session task.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Board after a tick or command
    Snapshot(Box<RenderSnapshot>),
    /// Events in emission order
    Events(Vec<GameEvent>),
    /// A relic offer is waiting on the player
    RelicOffer(Vec<RelicKind>),
    /// The run ended
    GameOver(GameOverReport),
}

// =============================================================================
// HANDLE
// =============================================================================

/// Handle to a running session task.
pub struct SessionHandle<S: MetaStore> {
    commands: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<SessionUpdate>,
    client: Arc<MetaClient<S>>,
    task: JoinHandle<RunSession>,
}

impl<S: MetaStore> SessionHandle<S> {
    /// Subscribe to session updates.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionUpdate> {
        self.updates.subscribe()
    }

    /// Meta client the session reports to.
    pub fn client(&self) -> &Arc<MetaClient<S>> {
        &self.client
    }

    /// Start (or restart) a run.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Start).await
    }

    /// Queue a turn for the next tick.
    pub async fn turn(&self, direction: Direction) -> Result<(), SessionError> {
        self.send(SessionCommand::Turn(direction)).await
    }

    /// Claim choice `index` from the open offer.
    pub async fn claim_relic(&self, index: usize) -> Result<RelicKind, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::ClaimRelic { index, reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Decline the open offer.
    pub async fn decline_relic(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.send(SessionCommand::DeclineRelic { reply }).await?;
        rx.await.map_err(|_| SessionError::Closed)?
    }

    /// Buy an upgrade between runs and flash the outcome.
    pub async fn purchase(&self, key: &str) -> String {
        let message = self.client.purchase(key).await;
        if self.send(SessionCommand::Status(message.clone())).await.is_err() {
            debug!("Session closed before purchase status was shown");
        }
        message
    }

    /// Stop the session, waiting for in-flight reports.
    ///
    /// Returns the session so the last run can be inspected or replayed.
    pub async fn shutdown(self) -> Result<RunSession, SessionError> {
        // The task also stops once every sender is gone
        let _ = self.commands.send(SessionCommand::Shutdown).await;
        self.task.await.map_err(|e| {
            error!("Session task failed: {}", e);
            SessionError::Closed
        })
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.commands.send(command).await.map_err(|_| SessionError::Closed)
    }
}

/// Spawn a session task reporting to `client`.
pub fn spawn_session<S: MetaStore>(config: SessionConfig, client: Arc<MetaClient<S>>) -> SessionHandle<S> {
    let profile_key = client.profile().map(|p| *p.as_bytes()).unwrap_or([0; 16]);
    let session = RunSession::new(config.rules.clone(), profile_key, config.base_seed);

    let (commands, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (updates, _) = broadcast::channel(config.snapshot_buffer.max(1));

    let task = tokio::spawn(run_session_loop(session, client.clone(), command_rx, updates.clone()));

    SessionHandle {
        commands,
        updates,
        client,
        task,
    }
}

// =============================================================================
// LOOP
// =============================================================================

async fn run_session_loop<S: MetaStore>(
    mut session: RunSession,
    client: Arc<MetaClient<S>>,
    mut commands: mpsc::Receiver<SessionCommand>,
    updates: broadcast::Sender<SessionUpdate>,
) -> RunSession {
    // Meta must be known before the first run starts
    let meta = client.load().await;
    info!("Session ready: {} essence, guest={}", meta.essence, client.is_guest());

    let mut timer = TickTimer::paused(session.interval_ms());
    let mut reports: JoinSet<Vec<String>> = JoinSet::new();

    loop {
        tokio::select! {
            _ = timer.wait() => {
                let result = session.step();

                if let Some(period) = result.reschedule {
                    timer.reschedule(period);
                }
                if !result.events.is_empty() {
                    publish(&updates, SessionUpdate::Events(result.events));
                }
                publish(&updates, SessionUpdate::Snapshot(Box::new(result.snapshot)));

                if let Some(choices) = result.relic_offer {
                    timer.pause();
                    publish(&updates, SessionUpdate::RelicOffer(choices));
                }
                if let Some(report) = result.game_over {
                    timer.pause();
                    info!("Run over at {} points", report.final_score);
                    publish(&updates, SessionUpdate::GameOver(report));

                    let client = client.clone();
                    reports.spawn(async move { report_game_over(&client, report).await });
                }
            }

            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("All session handles dropped");
                    break;
                };
                match command {
                    SessionCommand::Start => {
                        let meta = client.current().await;
                        let snapshot = session.start(&meta);
                        timer.restart(session.interval_ms());
                        let events = session.drain_events();
                        if !events.is_empty() {
                            publish(&updates, SessionUpdate::Events(events));
                        }
                        publish(&updates, SessionUpdate::Snapshot(Box::new(snapshot)));
                    }
                    SessionCommand::Turn(direction) => {
                        if let Err(e) = session.queue_direction(direction) {
                            debug!("Turn ignored: {}", e);
                        }
                    }
                    SessionCommand::ClaimRelic { index, reply } => {
                        let result = session.claim_relic(index);
                        if result.is_ok() {
                            timer.resume();
                            publish_settled(&mut session, &updates);
                        }
                        let _ = reply.send(result);
                    }
                    SessionCommand::DeclineRelic { reply } => {
                        let result = session.decline_relic();
                        if result.is_ok() {
                            timer.resume();
                            publish_settled(&mut session, &updates);
                        }
                        let _ = reply.send(result);
                    }
                    SessionCommand::Status(text) => {
                        session.flash(text);
                        publish(&updates, SessionUpdate::Snapshot(Box::new(session.snapshot())));
                    }
                    SessionCommand::Shutdown => {
                        info!("Session shutdown requested");
                        break;
                    }
                }
            }

            Some(joined) = reports.join_next(), if !reports.is_empty() => {
                match joined {
                    Ok(messages) => {
                        for message in messages {
                            session.flash(message);
                        }
                        publish(&updates, SessionUpdate::Snapshot(Box::new(session.snapshot())));
                    }
                    Err(e) => warn!("Game-over report task failed: {}", e),
                }
            }
        }
    }

    timer.pause();
    while let Some(joined) = reports.join_next().await {
        if let Err(e) = joined {
            warn!("Game-over report task failed: {}", e);
        }
    }
    session
}

fn publish_settled(session: &mut RunSession, updates: &broadcast::Sender<SessionUpdate>) {
    let events = session.drain_events();
    if !events.is_empty() {
        publish(updates, SessionUpdate::Events(events));
    }
    publish(updates, SessionUpdate::Snapshot(Box::new(session.snapshot())));
}

fn publish(updates: &broadcast::Sender<SessionUpdate>, update: SessionUpdate) {
    // No subscribers is not an error
    let _ = updates.send(update);
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::Position;
    use crate::game::spawn::SpawnConfig;
    use crate::meta::store::InMemoryMetaStore;
    use crate::GAME_NAME;
    use tokio::sync::broadcast::error::RecvError;

    fn quiet_config() -> SessionConfig {
        SessionConfig {
            base_seed: 77,
            snapshot_buffer: 256,
            command_buffer: 32,
            rules: RunRules {
                spawn: SpawnConfig {
                    pickup_chance_percent: 0,
                    ..SpawnConfig::default()
                },
                ..RunRules::default()
            },
        }
    }

    async fn next_update(rx: &mut broadcast::Receiver<SessionUpdate>) -> SessionUpdate {
        loop {
            match rx.recv().await {
                Ok(update) => return update,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("session closed"),
            }
        }
    }

    async fn next_snapshot(rx: &mut broadcast::Receiver<SessionUpdate>) -> RenderSnapshot {
        loop {
            if let SessionUpdate::Snapshot(snapshot) = next_update(rx).await {
                return *snapshot;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_at_period() {
        let mut timer = TickTimer::new(120);
        let t0 = Instant::now();
        timer.wait().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(120));

        assert!(timer.reschedule(84));
        assert!(!timer.reschedule(84));
        let t1 = Instant::now();
        timer.wait().await;
        assert_eq!(t1.elapsed(), Duration::from_millis(84));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_timer_is_silent() {
        let mut timer = TickTimer::paused(100);
        assert!(timer.is_paused());
        assert!(tokio::time::timeout(Duration::from_secs(10), timer.wait()).await.is_err());

        // Rescheduling while paused only records the period
        timer.reschedule(60);
        assert!(timer.is_paused());

        timer.resume();
        let t0 = Instant::now();
        timer.wait().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_discards_partial_period() {
        let mut timer = TickTimer::new(120);
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Same period, yet the countdown starts over
        timer.restart(120);
        let t0 = Instant::now();
        timer.wait().await;
        assert_eq!(t0.elapsed(), Duration::from_millis(120));

        timer.pause();
        timer.restart(90);
        assert!(!timer.is_paused());
        assert_eq!(timer.period_ms(), 90);
    }

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.snapshot_buffer, 64);
        assert_eq!(config.rules.status_ms, 2_500);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_ticks_in_real_time() {
        let client = Arc::new(MetaClient::new(Arc::new(InMemoryMetaStore::new()), None));
        let handle = spawn_session(quiet_config(), client);
        let mut rx = handle.subscribe();

        let t0 = Instant::now();
        handle.start().await.unwrap();
        let opening = next_snapshot(&mut rx).await;
        assert_eq!(opening.tick, 0);
        assert_eq!(opening.phase, "running");

        let mut last = opening;
        while last.tick < 5 {
            last = next_snapshot(&mut rx).await;
        }
        assert_eq!(last.head(), Some(Position::new(15, 10)));
        assert_eq!(last.score, 10);
        assert_eq!(t0.elapsed(), Duration::from_millis(600));

        let session = handle.shutdown().await.unwrap();
        assert_eq!(session.recording().unwrap().end_tick, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_a_full_interval() {
        let client = Arc::new(MetaClient::new(Arc::new(InMemoryMetaStore::new()), None));
        let handle = spawn_session(quiet_config(), client);
        let mut rx = handle.subscribe();

        handle.start().await.unwrap();
        assert_eq!(next_snapshot(&mut rx).await.tick, 0);

        // Restart partway through the first period
        tokio::time::sleep(Duration::from_millis(50)).await;
        let t1 = Instant::now();
        handle.start().await.unwrap();
        assert_eq!(next_snapshot(&mut rx).await.tick, 0);

        let first = next_snapshot(&mut rx).await;
        assert_eq!(first.tick, 1);
        assert_eq!(t1.elapsed(), Duration::from_millis(120));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_turns_reach_the_simulation() {
        let client = Arc::new(MetaClient::new(Arc::new(InMemoryMetaStore::new()), None));
        let handle = spawn_session(quiet_config(), client);
        let mut rx = handle.subscribe();

        handle.start().await.unwrap();
        next_snapshot(&mut rx).await;
        handle.turn(Direction::Up).await.unwrap();

        let snapshot = next_snapshot(&mut rx).await;
        assert_eq!(snapshot.head(), Some(Position::new(10, 9)));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_claim_without_offer() {
        let client = Arc::new(MetaClient::new(Arc::new(InMemoryMetaStore::new()), None));
        let handle = spawn_session(quiet_config(), client);

        assert_eq!(handle.claim_relic(0).await, Err(SessionError::NoRelicOffer));
        assert_eq!(handle.decline_relic().await, Err(SessionError::NoRelicOffer));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_purchase_status_is_flashed() {
        let client = Arc::new(MetaClient::new(Arc::new(InMemoryMetaStore::new()), Some(Uuid::new_v4())));
        let handle = spawn_session(quiet_config(), client);
        let mut rx = handle.subscribe();

        assert_eq!(handle.purchase("bogus").await, "Unknown upgrade");
        let snapshot = next_snapshot(&mut rx).await;
        assert_eq!(snapshot.status_message.as_deref(), Some("Unknown upgrade"));
        handle.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_game_over_is_reported() {
        let store = Arc::new(InMemoryMetaStore::new());
        let profile = Uuid::from_bytes([3; 16]);
        let client = Arc::new(MetaClient::new(store.clone(), Some(profile)));
        let handle = spawn_session(quiet_config(), client);
        let mut rx = handle.subscribe();

        handle.start().await.unwrap();

        // Heading right forever: a hazard lands on the row sooner or later
        let mut report = None;
        for _ in 0..200_000 {
            match next_update(&mut rx).await {
                SessionUpdate::RelicOffer(_) => handle.decline_relic().await.unwrap(),
                SessionUpdate::GameOver(r) => {
                    report = Some(r);
                    break;
                }
                _ => {}
            }
        }
        let report = report.expect("run should end");

        let session = handle.shutdown().await.unwrap();
        assert!(session.state().is_over());

        let scores = store.top_scores(GAME_NAME).await;
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].score, report.final_score as i64);

        let essence = store.fetch_meta(profile).await.unwrap().essence;
        assert_eq!(essence, report.essence_earned.unwrap_or(0));
    }
}
