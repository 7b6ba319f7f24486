//! Bot decision engine
//!
//! Each tick a bot looks for a target and asks its strategy for an intent:
//! a movement delta plus an optional throw. Two strategies exist:
//!
//! - [`BasicStrategy`]: cooldown-driven wandering, aggression ramp before the
//!   first throw, evade when cornered, otherwise pursue.
//! - [`SkillGatedStrategy`]: distance tiers (evade / strafe / pursue) unlocked
//!   by the bot's persisted skills, with an accuracy-dependent throw spread.
//!
//! Behavior state here is transient and resets with the process; the
//! persisted progression lives in [`crate::store::skills`].

use std::f32::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_chacha::ChaCha8Rng;

use super::physics::PhysicsSystem;
use super::world::Entity;
use crate::config::GameTuning;
use crate::store::skills::Skills;

/// What a bot did on its last decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotAction {
    Idle,
    Wandering,
    Approaching,
    Attacking,
    Evading,
    Strafing,
    Pursuing,
}

/// Per-bot scratch state, never persisted
#[derive(Debug, Clone)]
pub struct BotBehavior {
    /// Current wander heading in radians
    pub wander_heading: f32,
    /// Milliseconds until the basic strategy re-picks its heading
    pub movement_cooldown: f32,
    /// Builds up while a target stays in range
    pub aggression: f32,
    /// Builds up while evading; tracked for future skill feedback
    pub evasion: f32,
    /// Milliseconds until the basic strategy may throw again
    pub attack_cooldown: f32,
    /// Milliseconds since the skill-gated strategy changed heading
    pub since_heading_change: f32,
    /// Milliseconds since the skill-gated strategy last threw
    pub since_last_throw: f32,
    pub last_action: BotAction,
}

impl BotBehavior {
    pub fn new(rng: &mut ChaCha8Rng) -> Self {
        Self {
            wander_heading: rng.gen_range(0.0..TAU),
            movement_cooldown: 0.0,
            aggression: 0.0,
            evasion: 0.0,
            attack_cooldown: 0.0,
            since_heading_change: f32::MAX,
            since_last_throw: f32::MAX,
            last_action: BotAction::Idle,
        }
    }
}

/// Where the chosen target stands
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub x: f32,
    pub y: f32,
    pub is_bot: bool,
}

/// Everything a strategy may look at
#[derive(Debug, Clone, Copy)]
pub struct BotContext<'a> {
    pub x: f32,
    pub y: f32,
    pub target: Option<Target>,
    pub skills: Skills,
    pub delta_ms: f32,
    pub tuning: &'a GameTuning,
}

impl BotContext<'_> {
    fn distance_to(&self, target: &Target) -> f32 {
        PhysicsSystem::distance(self.x, self.y, target.x, target.y)
    }

    fn angle_to(&self, target: &Target) -> f32 {
        PhysicsSystem::angle_to(self.x, self.y, target.x, target.y)
    }

    /// Aim point is the target's body center
    fn aim_at(&self, target: &Target) -> f32 {
        let half = self.tuning.player_size / 2.0;
        PhysicsSystem::angle_to(self.x, self.y, target.x + half, target.y + half)
    }
}

/// Movement and action chosen for one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BotIntent {
    pub dx: f32,
    pub dy: f32,
    /// Throw a snowball at this angle
    pub throw: Option<f32>,
}

impl BotIntent {
    fn heading(angle: f32, speed: f32) -> Self {
        Self {
            dx: angle.cos() * speed,
            dy: angle.sin() * speed,
            throw: None,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.dx.is_finite() && self.dy.is_finite() && self.throw.map_or(true, f32::is_finite)
    }
}

/// Pick the nearest visible human, falling back to the nearest visible bot
pub fn select_target(bot: &Entity, entities: &[Entity], vision_radius: f32) -> Option<Target> {
    let nearest = |want_bot: bool| {
        entities
            .iter()
            .filter(|e| e.id != bot.id && e.is_bot == want_bot)
            .map(|e| (PhysicsSystem::distance(bot.x, bot.y, e.x, e.y), e))
            .filter(|(d, _)| *d < vision_radius)
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, e)| Target {
                x: e.x,
                y: e.y,
                is_bot: e.is_bot,
            })
    };

    nearest(false).or_else(|| nearest(true))
}

/// A bot decision procedure
pub trait BotStrategy {
    fn decide(
        &self,
        ctx: &BotContext<'_>,
        behavior: &mut BotBehavior,
        rng: &mut ChaCha8Rng,
    ) -> BotIntent;
}

/// Cooldown and aggression driven behavior
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicStrategy;

impl BotStrategy for BasicStrategy {
    fn decide(
        &self,
        ctx: &BotContext<'_>,
        behavior: &mut BotBehavior,
        rng: &mut ChaCha8Rng,
    ) -> BotIntent {
        let tuning = ctx.tuning;
        let mut intent = BotIntent::default();

        match ctx.target {
            None => {
                if behavior.movement_cooldown <= 0.0 {
                    let (lo, hi) = tuning.wander_cooldown_ms;
                    behavior.wander_heading = rng.gen_range(0.0..TAU);
                    behavior.movement_cooldown = rng.gen_range(lo..=hi);
                }
                let speed = tuning.move_step * (0.5 + ctx.skills.movement * 0.5);
                intent = BotIntent::heading(behavior.wander_heading, speed);
                behavior.movement_cooldown -= ctx.delta_ms;
                behavior.last_action = BotAction::Wandering;
            }
            Some(target) => {
                let distance = ctx.distance_to(&target);
                if distance < tuning.attack_radius && behavior.attack_cooldown <= 0.0 {
                    behavior.aggression += tuning.aggression_step;
                    if behavior.aggression > tuning.aggression_threshold {
                        intent.throw = Some(ctx.aim_at(&target));
                        behavior.attack_cooldown = tuning.bot_attack_cooldown_ms;
                        behavior.last_action = BotAction::Attacking;
                    } else {
                        behavior.last_action = BotAction::Approaching;
                    }
                } else if distance < tuning.evasion_radius {
                    behavior.evasion += tuning.evasion_step;
                    let away = ctx.angle_to(&target) + PI;
                    intent = BotIntent::heading(away, tuning.move_step * 1.5);
                    behavior.last_action = BotAction::Evading;
                } else {
                    intent = BotIntent::heading(ctx.angle_to(&target), tuning.move_step);
                    behavior.last_action = BotAction::Pursuing;
                }
            }
        }

        if behavior.attack_cooldown > 0.0 {
            behavior.attack_cooldown -= ctx.delta_ms;
        }

        intent
    }
}

/// Skill thresholds unlocking each movement tier
const SURVIVAL_TO_EVADE: f32 = 0.3;
const COMBAT_TO_STRAFE: f32 = 0.2;
const AWARENESS_TO_PURSUE: f32 = 0.1;
const MOVEMENT_TO_JITTER: f32 = 0.3;

/// Behavior gated by the bot's persisted skills
#[derive(Debug, Clone, Copy, Default)]
pub struct SkillGatedStrategy;

impl SkillGatedStrategy {
    /// Shot accuracy in `[0.1, 1.0]`
    pub fn accuracy(combat: f32) -> f32 {
        0.1 + combat * 0.9
    }

    /// Minimum pause between throws, shrinking with combat skill
    pub fn throw_cooldown(combat: f32) -> f32 {
        (1000.0 - combat * 500.0).max(300.0)
    }
}

impl BotStrategy for SkillGatedStrategy {
    fn decide(
        &self,
        ctx: &BotContext<'_>,
        behavior: &mut BotBehavior,
        rng: &mut ChaCha8Rng,
    ) -> BotIntent {
        let tuning = ctx.tuning;
        let skills = ctx.skills;
        behavior.since_heading_change += ctx.delta_ms;
        behavior.since_last_throw += ctx.delta_ms;

        let Some(target) = ctx.target else {
            if behavior.since_heading_change > tuning.wander_period_ms {
                behavior.wander_heading = rng.gen_range(0.0..TAU);
                behavior.since_heading_change = 0.0;
            }
            let speed = tuning.move_step * (0.5 + skills.movement * 0.5);
            behavior.last_action = BotAction::Wandering;
            return BotIntent::heading(behavior.wander_heading, speed);
        };

        let distance = ctx.distance_to(&target);
        let angle = ctx.angle_to(&target);
        let mut throw = None;

        if distance < tuning.attack_radius
            && skills.combat > 0.0
            && behavior.since_last_throw > Self::throw_cooldown(skills.combat)
            && rng.gen::<f32>() < skills.combat
        {
            let spread = (rng.gen::<f32>() - 0.5) * (1.0 - Self::accuracy(skills.combat));
            throw = Some(angle + spread);
            behavior.since_last_throw = 0.0;
        }

        let mut intent = if distance < tuning.evasion_radius && skills.survival > SURVIVAL_TO_EVADE {
            behavior.evasion += tuning.evasion_step;
            behavior.last_action = BotAction::Evading;
            BotIntent::heading(angle + PI, tuning.move_step * (0.7 + skills.survival * 0.3))
        } else if distance < tuning.strafe_radius && skills.combat > COMBAT_TO_STRAFE {
            behavior.last_action = BotAction::Strafing;
            BotIntent::heading(angle + FRAC_PI_2, tuning.move_step)
        } else if skills.awareness > AWARENESS_TO_PURSUE {
            behavior.last_action = BotAction::Pursuing;
            BotIntent::heading(angle, tuning.move_step * (0.6 + skills.awareness * 0.4))
        } else {
            behavior.last_action = BotAction::Idle;
            BotIntent::default()
        };

        if skills.movement > MOVEMENT_TO_JITTER {
            intent.dx += (rng.gen::<f32>() - 0.5) * skills.movement * 5.0;
            intent.dy += (rng.gen::<f32>() - 0.5) * skills.movement * 5.0;
        }

        if throw.is_some() {
            behavior.last_action = BotAction::Attacking;
        }
        intent.throw = throw;
        intent
    }
}

/// Which strategy drives the bots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BotStrategyKind {
    #[default]
    Basic,
    SkillGated,
}

impl BotStrategy for BotStrategyKind {
    fn decide(
        &self,
        ctx: &BotContext<'_>,
        behavior: &mut BotBehavior,
        rng: &mut ChaCha8Rng,
    ) -> BotIntent {
        match self {
            BotStrategyKind::Basic => BasicStrategy.decide(ctx, behavior, rng),
            BotStrategyKind::SkillGated => SkillGatedStrategy.decide(ctx, behavior, rng),
        }
    }
}

impl FromStr for BotStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "skill_gated" | "skill-gated" => Ok(Self::SkillGated),
            other => Err(format!("unknown bot strategy: {other}")),
        }
    }
}

impl fmt::Display for BotStrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BotStrategyKind::Basic => write!(f, "basic"),
            BotStrategyKind::SkillGated => write!(f, "skill_gated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn entity(id: &str, x: f32, y: f32, is_bot: bool) -> Entity {
        Entity {
            id: id.to_string(),
            x,
            y,
            is_bot,
            session_id: None,
        }
    }

    fn ctx<'a>(tuning: &'a GameTuning, target: Option<Target>, skills: Skills) -> BotContext<'a> {
        BotContext {
            x: 1000.0,
            y: 1000.0,
            target,
            skills,
            delta_ms: tuning.tick_ms(),
            tuning,
        }
    }

    fn target_at(x: f32, y: f32) -> Option<Target> {
        Some(Target { x, y, is_bot: false })
    }

    #[test]
    fn prefers_humans_over_closer_bots() {
        let me = entity("bot_0", 0.0, 0.0, true);
        let entities = vec![
            me.clone(),
            entity("bot_1", 10.0, 0.0, true),
            entity("human", 300.0, 0.0, false),
        ];
        let target = select_target(&me, &entities, 500.0).unwrap();
        assert!(!target.is_bot);
        assert_eq!(target.x, 300.0);
    }

    #[test]
    fn falls_back_to_nearest_bot_and_ignores_out_of_sight() {
        let me = entity("bot_0", 0.0, 0.0, true);
        let entities = vec![
            me.clone(),
            entity("bot_far", 200.0, 0.0, true),
            entity("bot_near", 50.0, 0.0, true),
            entity("human", 900.0, 0.0, false),
        ];
        let target = select_target(&me, &entities, 500.0).unwrap();
        assert!(target.is_bot);
        assert_eq!(target.x, 50.0);

        let alone = vec![me.clone()];
        assert!(select_target(&me, &alone, 500.0).is_none());
    }

    #[test]
    fn basic_wander_keeps_heading_until_cooldown_expires() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut behavior = BotBehavior::new(&mut rng);

        let c = ctx(&tuning, None, Skills::default());
        let first = BasicStrategy.decide(&c, &mut behavior, &mut rng);
        assert!(first.dx != 0.0 || first.dy != 0.0);
        let heading = behavior.wander_heading;
        let cooldown = behavior.movement_cooldown + c.delta_ms;
        assert!((500.0..=1500.0).contains(&cooldown));

        // The heading survives every tick strictly inside the cooldown
        let ticks_inside = (cooldown / c.delta_ms).ceil() as usize - 1;
        for _ in 0..ticks_inside {
            let next = BasicStrategy.decide(&c, &mut behavior, &mut rng);
            assert_eq!(behavior.wander_heading, heading);
            assert_eq!(next, first);
        }
        assert!(behavior.movement_cooldown <= 0.0);
    }

    #[test]
    fn basic_wander_speed_scales_with_movement_skill() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let mut behavior = BotBehavior::new(&mut rng);
        let skills = Skills {
            movement: 1.0,
            ..Skills::default()
        };
        let intent = BasicStrategy.decide(&ctx(&tuning, None, skills), &mut behavior, &mut rng);
        let speed = (intent.dx * intent.dx + intent.dy * intent.dy).sqrt();
        assert!((speed - tuning.move_step).abs() < 1e-4);
    }

    #[test]
    fn basic_attack_ramps_up_before_first_throw() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut behavior = BotBehavior::new(&mut rng);
        let c = ctx(&tuning, target_at(1200.0, 1000.0), Skills::default());

        let first = BasicStrategy.decide(&c, &mut behavior, &mut rng);
        assert!(first.throw.is_none());
        assert_eq!(behavior.last_action, BotAction::Approaching);

        let mut thrown = None;
        for tick in 1..20 {
            if let Some(angle) = BasicStrategy.decide(&c, &mut behavior, &mut rng).throw {
                thrown = Some((tick, angle));
                break;
            }
        }
        let (tick, angle) = thrown.expect("bot never threw");
        assert!(tick >= 6);
        // Aimed at the body center of a target straight ahead and slightly lower
        let expected = (16.0f32).atan2(216.0);
        assert!((angle - expected).abs() < 1e-5);
        assert!(behavior.attack_cooldown > 0.0);
    }

    #[test]
    fn basic_evades_close_targets_while_cooling_down() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut behavior = BotBehavior::new(&mut rng);
        behavior.attack_cooldown = 500.0;
        let c = ctx(&tuning, target_at(1100.0, 1000.0), Skills::default());

        let intent = BasicStrategy.decide(&c, &mut behavior, &mut rng);
        assert_eq!(behavior.last_action, BotAction::Evading);
        assert!((intent.dx + 15.0).abs() < 1e-4);
        assert!(behavior.evasion > 0.0);
    }

    #[test]
    fn basic_pursues_distant_targets() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let mut behavior = BotBehavior::new(&mut rng);
        let c = ctx(&tuning, target_at(1000.0, 1400.0), Skills::default());

        let intent = BasicStrategy.decide(&c, &mut behavior, &mut rng);
        assert_eq!(behavior.last_action, BotAction::Pursuing);
        assert!(intent.dx.abs() < 1e-4);
        assert!((intent.dy - 10.0).abs() < 1e-4);
    }

    #[test]
    fn skill_gated_novice_only_wanders_or_idles() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(9);
        let mut behavior = BotBehavior::new(&mut rng);
        let c = ctx(&tuning, target_at(1100.0, 1000.0), Skills::default());

        let intent = SkillGatedStrategy.decide(&c, &mut behavior, &mut rng);
        assert_eq!(intent, BotIntent::default());
        assert_eq!(behavior.last_action, BotAction::Idle);
    }

    #[test]
    fn skill_gated_veteran_strafes_and_throws() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let mut behavior = BotBehavior::new(&mut rng);
        let skills = Skills {
            movement: 0.2,
            awareness: 1.0,
            combat: 1.0,
            survival: 0.0,
        };
        let c = ctx(&tuning, target_at(1300.0, 1000.0), skills);

        let intent = SkillGatedStrategy.decide(&c, &mut behavior, &mut rng);
        // Perfect accuracy means no spread and a perpendicular strafe
        let angle = intent.throw.expect("veteran should throw");
        assert!(angle.abs() < 1e-6);
        assert!(intent.dx.abs() < 1e-4);
        assert!((intent.dy - 10.0).abs() < 1e-4);

        // Cooldown blocks the next throw
        let again = SkillGatedStrategy.decide(&c, &mut behavior, &mut rng);
        assert!(again.throw.is_none());
        assert_eq!(behavior.last_action, BotAction::Strafing);
    }

    #[test]
    fn skill_gated_survivor_evades() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut behavior = BotBehavior::new(&mut rng);
        let skills = Skills {
            movement: 0.2,
            awareness: 0.0,
            combat: 0.0,
            survival: 1.0,
        };
        let c = ctx(&tuning, target_at(1100.0, 1000.0), skills);

        let intent = SkillGatedStrategy.decide(&c, &mut behavior, &mut rng);
        assert_eq!(behavior.last_action, BotAction::Evading);
        assert!((intent.dx + 10.0).abs() < 1e-4);
    }

    #[test]
    fn accuracy_and_cooldown_follow_combat_skill() {
        assert!((SkillGatedStrategy::accuracy(0.0) - 0.1).abs() < 1e-6);
        assert!((SkillGatedStrategy::accuracy(1.0) - 1.0).abs() < 1e-6);
        assert!((SkillGatedStrategy::throw_cooldown(0.2) - 900.0).abs() < 1e-3);
        assert!((SkillGatedStrategy::throw_cooldown(1.0) - 500.0).abs() < 1e-3);
        assert_eq!(SkillGatedStrategy::throw_cooldown(1.5), 300.0);
    }

    #[test]
    fn strategy_kind_dispatches() {
        let tuning = GameTuning::default();
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let mut behavior = BotBehavior::new(&mut rng);
        let c = ctx(&tuning, target_at(1000.0, 1400.0), Skills::default());
        let intent = BotStrategyKind::Basic.decide(&c, &mut behavior, &mut rng);
        assert_eq!(behavior.last_action, BotAction::Pursuing);
        assert!(intent.is_finite());
        assert_eq!(BotStrategyKind::SkillGated.to_string(), "skill_gated");
    }
}
