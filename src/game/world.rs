//! Authoritative world state and the per-tick simulation pass
//!
//! `World` owns every mutable piece of the simulation: entities, their
//! buffered inputs, bot behavior scratch state, snowballs in flight and the
//! skill store. It never touches a transport, so a test can drive it tick by
//! tick with a seeded RNG.

use std::collections::{BTreeMap, HashMap};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::bot::{select_target, BotBehavior, BotContext, BotStrategy, BotStrategyKind};
use super::combat::{HitResult, Snowball};
use super::map::MapGrid;
use super::physics::PhysicsSystem;
use super::InputState;
use crate::config::GameTuning;
use crate::store::skills::{BotStats, SkillStore};

/// A player or bot
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    /// Top-left corner of the hitbox
    pub x: f32,
    pub y: f32,
    pub is_bot: bool,
    /// Owning websocket session, absent for bots
    pub session_id: Option<Uuid>,
}

/// Outcome of one simulation step
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub tick: u64,
    pub hits: Vec<HitResult>,
}

/// Per-entity faults; the offending entity is skipped for the tick
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("bot {bot_id} produced a non-finite intent")]
    NonFiniteIntent { bot_id: String },
}

/// Pick a uniformly random position whose hitbox is clear of solid tiles
pub fn random_valid_position(rng: &mut ChaCha8Rng, map: &MapGrid, tuning: &GameTuning) -> (f32, f32) {
    let max = tuning.max_coord();
    let mut candidate = (0.0, 0.0);
    for _ in 0..tuning.spawn_attempts.max(1) {
        candidate = (rng.gen_range(0.0..=max), rng.gen_range(0.0..=max));
        if !PhysicsSystem::collides_with_map(map, candidate.0, candidate.1, tuning.player_size) {
            return candidate;
        }
    }
    warn!(
        x = candidate.0,
        y = candidate.1,
        "No clear spawn position found, placing on last candidate"
    );
    candidate
}

pub struct World {
    tuning: GameTuning,
    map: MapGrid,
    entities: Vec<Entity>,
    inputs: HashMap<String, InputState>,
    behaviors: HashMap<String, BotBehavior>,
    snowballs: Vec<Snowball>,
    skills: SkillStore,
    strategy: BotStrategyKind,
    rng: ChaCha8Rng,
    tick: u64,
}

impl World {
    pub fn new(
        map: MapGrid,
        tuning: GameTuning,
        skills: SkillStore,
        strategy: BotStrategyKind,
        seed: u64,
    ) -> Self {
        Self {
            tuning,
            map,
            entities: Vec::new(),
            inputs: HashMap::new(),
            behaviors: HashMap::new(),
            snowballs: Vec::new(),
            skills,
            strategy,
            rng: ChaCha8Rng::seed_from_u64(seed),
            tick: 0,
        }
    }

    pub fn tuning(&self) -> &GameTuning {
        &self.tuning
    }

    pub fn map(&self) -> &MapGrid {
        &self.map
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn snowballs(&self) -> &[Snowball] {
        &self.snowballs
    }

    pub fn skills(&self) -> &SkillStore {
        &self.skills
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn human_count(&self) -> usize {
        self.entities.iter().filter(|e| !e.is_bot).count()
    }

    pub fn bot_count(&self) -> usize {
        self.entities.iter().filter(|e| e.is_bot).count()
    }

    /// Spawn the bot roster `bot_0..bot_{count-1}` at random valid positions
    pub fn spawn_bots(&mut self, count: usize) {
        for i in 0..count {
            let id = format!("bot_{i}");
            if self.entity(&id).is_some() {
                continue;
            }
            let (x, y) = random_valid_position(&mut self.rng, &self.map, &self.tuning);
            self.skills.ensure_profile(&id);
            self.insert_bot(id, x, y);
        }
        info!(bots = self.bot_count(), strategy = %self.strategy, "Bots spawned");
    }

    /// Place an entity at an exact position, bypassing spawn selection
    pub fn spawn_at(&mut self, id: &str, x: f32, y: f32, is_bot: bool) {
        self.entities.retain(|e| e.id != id);
        if is_bot {
            self.skills.ensure_profile(id);
            self.insert_bot(id.to_string(), x, y);
        } else {
            self.entities.push(Entity {
                id: id.to_string(),
                x,
                y,
                is_bot: false,
                session_id: None,
            });
        }
    }

    fn insert_bot(&mut self, id: String, x: f32, y: f32) {
        self.behaviors
            .insert(id.clone(), BotBehavior::new(&mut self.rng));
        self.entities.push(Entity {
            id,
            x,
            y,
            is_bot: true,
            session_id: None,
        });
    }

    /// Create the entity for a freshly connected session, returns its id
    pub fn join(&mut self, session_id: Uuid) -> String {
        let id = session_id.to_string();
        if self.entity(&id).is_some() {
            warn!(session_id = %session_id, "Session already has an entity");
            return id;
        }

        let (x, y) = random_valid_position(&mut self.rng, &self.map, &self.tuning);
        self.entities.push(Entity {
            id: id.clone(),
            x,
            y,
            is_bot: false,
            session_id: Some(session_id),
        });
        info!(player_id = %id, x, y, players = self.human_count(), "Player joined");
        id
    }

    /// Remove an entity and everything buffered for it
    pub fn leave(&mut self, id: &str) -> bool {
        let before = self.entities.len();
        self.entities.retain(|e| e.id != id);
        self.inputs.remove(id);
        self.behaviors.remove(id);
        let removed = self.entities.len() != before;
        if removed {
            info!(player_id = %id, players = self.human_count(), "Player left");
        }
        removed
    }

    /// Replace the buffered input state wholesale, latest wins
    pub fn set_input(&mut self, id: &str, input: InputState) {
        if self.entities.iter().any(|e| e.id == id && !e.is_bot) {
            self.inputs.insert(id.to_string(), input);
        }
    }

    /// Spawn a snowball at the thrower's current position
    pub fn throw(&mut self, id: &str, angle: f32) -> bool {
        let Some(thrower) = self.entities.iter().find(|e| e.id == id) else {
            return false;
        };
        self.snowballs
            .push(Snowball::new(id, thrower.x, thrower.y, angle, &self.tuning));
        if thrower.is_bot {
            self.skills.record_shot(id);
        }
        true
    }

    pub fn all_bot_stats(&self) -> BTreeMap<String, BotStats> {
        self.skills.all_bot_stats()
    }

    /// Run one simulation step covering `delta_ms` of wall-clock time
    pub fn tick(&mut self, delta_ms: f32) -> TickReport {
        let delta_ms = if delta_ms.is_finite() && delta_ms > 0.0 {
            delta_ms
        } else {
            0.0
        };
        self.tick += 1;

        self.move_players();
        self.run_bots(delta_ms);
        let hits = self.update_snowballs(delta_ms);

        TickReport {
            tick: self.tick,
            hits,
        }
    }

    fn move_players(&mut self) {
        let step = self.tuning.move_step;
        let max = self.tuning.max_coord();
        let size = self.tuning.player_size;

        for entity in self.entities.iter_mut().filter(|e| !e.is_bot) {
            let input = self.inputs.get(&entity.id).copied().unwrap_or_default();
            let mut x = entity.x;
            let mut y = entity.y;

            if input.up {
                y = PhysicsSystem::clamp_axis(y - step, max);
            }
            if input.down {
                y = PhysicsSystem::clamp_axis(y + step, max);
            }
            if input.left {
                x = PhysicsSystem::clamp_axis(x - step, max);
            }
            if input.right {
                x = PhysicsSystem::clamp_axis(x + step, max);
            }

            // Any overlap rolls back the whole move
            if !PhysicsSystem::collides_with_map(&self.map, x, y, size) {
                entity.x = x;
                entity.y = y;
            }
        }
    }

    fn run_bots(&mut self, delta_ms: f32) {
        for i in 0..self.entities.len() {
            if !self.entities[i].is_bot {
                continue;
            }
            if let Err(e) = self.step_bot(i, delta_ms) {
                warn!(error = %e, "Skipping bot for this tick");
            }
            let bot_id = &self.entities[i].id;
            self.skills.record_play_time(bot_id, delta_ms);
        }
    }

    fn step_bot(&mut self, index: usize, delta_ms: f32) -> Result<(), SimError> {
        let bot = &self.entities[index];
        let bot_id = bot.id.clone();
        let ctx = BotContext {
            x: bot.x,
            y: bot.y,
            target: select_target(bot, &self.entities, self.tuning.vision_radius),
            skills: self.skills.skills(&bot_id),
            delta_ms,
            tuning: &self.tuning,
        };

        let rng = &mut self.rng;
        let behavior = self
            .behaviors
            .entry(bot_id.clone())
            .or_insert_with(|| BotBehavior::new(rng));
        let intent = self.strategy.decide(&ctx, behavior, rng);
        if !intent.is_finite() {
            return Err(SimError::NonFiniteIntent { bot_id });
        }

        if let Some(angle) = intent.throw {
            self.snowballs
                .push(Snowball::new(bot_id.as_str(), ctx.x, ctx.y, angle, &self.tuning));
            self.skills.record_shot(&bot_id);
        }

        let max = self.tuning.max_coord();
        let size = self.tuning.player_size;
        let x = PhysicsSystem::clamp_axis(ctx.x + intent.dx, max);
        let y = PhysicsSystem::clamp_axis(ctx.y + intent.dy, max);
        let bot = &mut self.entities[index];

        if !PhysicsSystem::collides_with_map(&self.map, x, y, size) {
            bot.x = x;
            bot.y = y;
        } else if PhysicsSystem::collides_with_map(&self.map, ctx.x, ctx.y, size) {
            // Stuck inside a tile: nudge so it can work its way out
            bot.x = PhysicsSystem::clamp_axis(ctx.x + self.rng.gen_range(-1.0..=1.0), max);
            bot.y = PhysicsSystem::clamp_axis(ctx.y + self.rng.gen_range(-1.0..=1.0), max);
        }

        Ok(())
    }

    fn update_snowballs(&mut self, delta_ms: f32) -> Vec<HitResult> {
        let size = self.tuning.player_size;
        let mut hits = Vec::new();

        // A ball whose lifetime ends this tick still gets its hit test
        for ball in self.snowballs.iter_mut() {
            ball.update(delta_ms, &self.tuning);

            let struck = self
                .entities
                .iter_mut()
                .find(|e| e.id != ball.owner_id && ball.check_hit(e.x, e.y, size));

            if let Some(target) = struck {
                ball.consume();
                hits.push(HitResult {
                    shooter_id: ball.owner_id.clone(),
                    target_id: target.id.clone(),
                    x: target.x,
                    y: target.y,
                });
                let (x, y) = random_valid_position(&mut self.rng, &self.map, &self.tuning);
                target.x = x;
                target.y = y;
            }
        }

        self.snowballs.retain(|ball| !ball.is_expired());

        for hit in &hits {
            self.attribute_hit(hit);
        }
        hits
    }

    fn attribute_hit(&mut self, hit: &HitResult) {
        let position = (hit.x, hit.y);

        match self.entities.iter().find(|e| e.id == hit.shooter_id) {
            Some(shooter) if shooter.is_bot => {
                self.skills.record_hit(&hit.shooter_id);
                self.skills.record_kill(&hit.shooter_id, position);
            }
            Some(_) => {}
            None => debug!(shooter_id = %hit.shooter_id, "Shooter gone, hit not credited"),
        }

        if self.entities.iter().any(|e| e.id == hit.target_id && e.is_bot) {
            self.skills.record_death(&hit.target_id, position);
        }
    }
}
