//! Crypt Snake Demo
//!
//! Runs one session in real time with a greedy autopilot, then replays
//! the recording and checks the state hash matches.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crypt_snake::{
    Direction, Position, GAME_NAME, VERSION,
    game::{input::RunRecording, snapshot::RenderSnapshot, tick::replay_run},
    meta::{InMemoryMetaStore, MetaClient, MetaStore},
    session::{spawn_session, SessionConfig, SessionUpdate},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Crypt Snake v{}", VERSION);

    let max_ticks: u32 = std::env::var("CRYPT_SNAKE_DEMO_TICKS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(400);

    demo_session(max_ticks).await
}

/// Play one autopiloted run, bank the result, verify the replay.
async fn demo_session(max_ticks: u32) -> Result<()> {
    info!("=== Starting Demo Session ===");

    let store = Arc::new(InMemoryMetaStore::new());
    let profile = Uuid::new_v4();
    store
        .earn_essence(profile, 150)
        .await
        .map_err(|e| anyhow!("seeding essence: {e}"))?;

    let client = Arc::new(MetaClient::new(store.clone(), Some(profile)));
    let config = SessionConfig::from_env();
    info!("Base seed: {}", config.base_seed);
    let handle = spawn_session(config, client);
    let mut updates = handle.subscribe();

    let message = handle.purchase("food_bonus").await;
    info!("Shop: {}", message);

    handle.start().await.context("starting run")?;
    let mut heading = Direction::Right;

    loop {
        let update = match updates.recv().await {
            Ok(update) => update,
            Err(RecvError::Lagged(n)) => {
                warn!("Autopilot fell behind by {} updates", n);
                continue;
            }
            Err(RecvError::Closed) => return Err(anyhow!("session closed mid-run")),
        };

        match update {
            SessionUpdate::Snapshot(snapshot) => {
                if snapshot.tick >= max_ticks {
                    info!("Tick limit reached at {} points", snapshot.score);
                    break;
                }
                if let Some(dir) = autopilot(&snapshot, heading) {
                    if dir != heading {
                        heading = dir;
                        handle.turn(dir).await.context("queueing turn")?;
                    }
                }
            }
            SessionUpdate::RelicOffer(choices) => {
                let kind = handle.claim_relic(0).await.context("claiming relic")?;
                info!("Offered {:?}, took {}", choices, kind.name());
            }
            SessionUpdate::GameOver(report) => {
                info!(
                    "Game over: {} points, {:?} essence, killed by {:?}",
                    report.final_score, report.essence_earned, report.contact
                );
                break;
            }
            SessionUpdate::Events(_) => {}
        }
    }

    let session = handle.shutdown().await.context("stopping session")?;
    let live_hash = session.state().compute_hash();
    info!("=== Run Results ===");
    info!("Final State Hash: {}", hex::encode(live_hash));
    for record in store.top_scores(GAME_NAME).await {
        info!("Leaderboard: {} by {}", record.score, record.profile);
    }
    let meta = store
        .fetch_meta(profile)
        .await
        .map_err(|e| anyhow!("reading meta: {e}"))?;
    info!("Essence banked: {}", meta.essence);

    // Verify determinism by replaying the serialized recording
    info!("=== Verifying Determinism ===");
    let recording = session.recording().context("no run was recorded")?;
    let bytes = recording.to_bytes().context("encoding recording")?;
    info!("Recording: {} bytes, {} ticks", bytes.len(), recording.end_tick);

    let decoded = RunRecording::from_bytes(&bytes).context("decoding recording")?;
    let (replayed, events) = replay_run(&decoded, session.rules())?;
    let replay_hash = replayed.compute_hash();
    info!("Replay State Hash: {} ({} events)", hex::encode(replay_hash), events.len());

    if live_hash == replay_hash {
        info!("DETERMINISM VERIFIED: Hashes match!");
        Ok(())
    } else {
        Err(anyhow!("DETERMINISM FAILURE: Hashes differ!"))
    }
}

/// Greedy step toward the food, avoiding the body and hazards.
fn autopilot(snapshot: &RenderSnapshot, heading: Direction) -> Option<Direction> {
    let head = snapshot.head()?;
    let cells = snapshot.cells;

    Direction::ALL
        .into_iter()
        .filter(|dir| !dir.reverses(heading))
        .filter_map(|dir| {
            let next = head.step(dir, cells);
            let blocked = snapshot.snake.iter().any(|&p| p == next)
                || snapshot.hazards.iter().any(|h| h.position == next);
            (!blocked).then(|| (wrapped_distance(next, snapshot.food, cells), dir))
        })
        .min_by_key(|&(distance, dir)| (distance, dir != heading))
        .map(|(_, dir)| dir)
}

fn wrapped_distance(a: Position, b: Position, cells: i32) -> i32 {
    let dx = (a.x - b.x).abs();
    let dy = (a.y - b.y).abs();
    dx.min(cells - dx) + dy.min(cells - dy)
}
