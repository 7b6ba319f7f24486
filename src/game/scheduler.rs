//! Fixed-rate tick driver
//!
//! The scheduler task is the only owner of the [`World`]. Sessions reach it
//! through [`WorldHandle`]: commands go in over an mpsc channel and are drained
//! at the start of every tick, snapshots come out over a broadcast channel.
//! The skill store is serialized inside the tick task and written to disk
//! from a spawned task so file I/O never stalls the tick.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex, Notify};
use tokio::time::{interval, interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::store::skills::{write_document, BotStats};
use crate::ws::protocol::ServerMsg;

use super::snapshot::SnapshotBuilder;
use super::{World, WorldCommand};

/// Command queue depth
const COMMAND_CAPACITY: usize = 256;
/// Snapshot backlog a slow session may fall behind before lagging
const SNAPSHOT_CAPACITY: usize = 64;

/// Cloneable handle to a running scheduler
#[derive(Clone)]
pub struct WorldHandle {
    commands: mpsc::Sender<WorldCommand>,
    snapshots: broadcast::Sender<ServerMsg>,
    shutdown: Arc<Notify>,
}

impl WorldHandle {
    /// Queue a command for the next tick, false once the scheduler is gone
    pub async fn send(&self, command: WorldCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMsg> {
        self.snapshots.subscribe()
    }

    /// Stats for every known bot profile
    pub async fn bot_stats(&self) -> Option<BTreeMap<String, BotStats>> {
        let (reply, rx) = oneshot::channel();
        if !self.send(WorldCommand::BotStats { reply }).await {
            return None;
        }
        rx.await.ok()
    }

    /// Stop the tick loop; the scheduler flushes the skill store on its way out
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

pub struct TickScheduler {
    world: World,
    commands: mpsc::Receiver<WorldCommand>,
    snapshots: broadcast::Sender<ServerMsg>,
    shutdown: Arc<Notify>,
    store_path: PathBuf,
    flush_interval: Duration,
    /// Serializes store writes so an older document never lands last
    write_lock: Arc<Mutex<()>>,
}

impl TickScheduler {
    pub fn new(world: World, store_path: PathBuf, flush_interval: Duration) -> (Self, WorldHandle) {
        let (command_tx, commands) = mpsc::channel(COMMAND_CAPACITY);
        let (snapshots, _) = broadcast::channel(SNAPSHOT_CAPACITY);
        let shutdown = Arc::new(Notify::new());

        let handle = WorldHandle {
            commands: command_tx,
            snapshots: snapshots.clone(),
            shutdown: shutdown.clone(),
        };

        let scheduler = Self {
            world,
            commands,
            snapshots,
            shutdown,
            store_path,
            flush_interval,
            write_lock: Arc::new(Mutex::new(())),
        };

        (scheduler, handle)
    }

    /// Run the authoritative tick loop until shutdown is requested
    pub async fn run(mut self) {
        let tick_duration = self.world.tuning().tick_interval();
        info!(
            tick_ms = tick_duration.as_secs_f32() * 1000.0,
            flush_secs = self.flush_interval.as_secs_f32(),
            "Tick scheduler started"
        );

        let mut tick_interval = interval(tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let flush_period = self.flush_interval.max(Duration::from_millis(1));
        let mut flush_interval = interval_at(Instant::now() + flush_period, flush_period);
        flush_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let shutdown = self.shutdown.clone();
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let delta_ms = now.duration_since(last_tick).as_secs_f32() * 1000.0;
                    last_tick = now;
                    self.step(delta_ms);
                }
                _ = flush_interval.tick() => {
                    self.spawn_flush();
                }
                _ = shutdown.notified() => {
                    info!(tick = self.world.tick_count(), "Tick scheduler stopping");
                    break;
                }
            }
        }

        self.flush().await;
        info!("Tick scheduler stopped");
    }

    /// Apply queued commands, simulate, publish snapshots
    fn step(&mut self, delta_ms: f32) {
        self.drain_commands();

        let report = self.world.tick(delta_ms);
        for hit in &report.hits {
            debug!(
                tick = report.tick,
                shooter_id = %hit.shooter_id,
                target_id = %hit.target_id,
                "Snowball hit"
            );
        }

        // No receivers is fine
        let _ = self.snapshots.send(SnapshotBuilder::players(&self.world));
        let _ = self.snapshots.send(SnapshotBuilder::snowballs(&self.world));
    }

    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            match command {
                WorldCommand::Join { session_id } => {
                    self.world.join(session_id);
                }
                WorldCommand::Leave { session_id } => {
                    self.world.leave(&session_id.to_string());
                }
                WorldCommand::Input { session_id, input } => {
                    self.world.set_input(&session_id.to_string(), input);
                }
                WorldCommand::Throw { session_id, angle } => {
                    if !self.world.throw(&session_id.to_string(), angle) {
                        debug!(session_id = %session_id, "Throw from unknown session");
                    }
                }
                WorldCommand::BotStats { reply } => {
                    let _ = reply.send(self.world.all_bot_stats());
                }
            }
        }
    }

    fn serialize_store(&self) -> Option<String> {
        match self.world.skills().to_json() {
            Ok(document) => Some(document),
            Err(e) => {
                warn!(error = %e, "Failed to serialize skill store");
                None
            }
        }
    }

    /// Fire-and-forget write; a failure is retried by the next interval
    fn spawn_flush(&self) {
        let Some(document) = self.serialize_store() else {
            return;
        };
        let path = self.store_path.clone();
        let lock = self.write_lock.clone();
        tokio::spawn(async move {
            let _guard = lock.lock().await;
            match write_document(&path, document).await {
                Ok(()) => debug!(path = %path.display(), "Skill store flushed"),
                Err(e) => warn!(path = %path.display(), error = %e, "Skill store flush failed"),
            }
        });
    }

    async fn flush(&self) {
        let Some(document) = self.serialize_store() else {
            return;
        };
        let _guard = self.write_lock.lock().await;
        match write_document(&self.store_path, document).await {
            Ok(()) => info!(
                path = %self.store_path.display(),
                bots = self.world.skills().len(),
                "Skill store saved"
            ),
            Err(e) => warn!(path = %self.store_path.display(), error = %e, "Final skill store flush failed"),
        }
    }
}
