//! Bot skill progression - experience, levels, skills and combat stats
//!
//! Profiles are keyed by bot id, created lazily, never removed while the
//! process runs, and persisted as a single JSON document.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Experience needed per level
pub const EXPERIENCE_PER_LEVEL: u64 = 300;
/// Experience for landing a hit
pub const HIT_EXPERIENCE: u64 = 50;
/// Extra experience for a hit while accuracy is above half
pub const ACCURACY_BONUS_EXPERIENCE: u64 = 20;
/// Experience for a kill
pub const KILL_EXPERIENCE: u64 = 100;
/// Extra experience on every fifth kill
pub const KILL_STREAK_EXPERIENCE: u64 = 50;
/// Experience for dying
pub const DEATH_EXPERIENCE: u64 = 10;
/// Survival bump granted on every fifth death
pub const DEATH_SURVIVAL_BONUS: f32 = 0.1;
/// Passive experience per second of play
pub const PLAYTIME_EXPERIENCE: u64 = 1;

/// Skill vector, each component in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Skills {
    pub movement: f32,
    pub awareness: f32,
    pub combat: f32,
    pub survival: f32,
}

impl Default for Skills {
    fn default() -> Self {
        Self {
            movement: 0.1,
            awareness: 0.0,
            combat: 0.0,
            survival: 0.0,
        }
    }
}

impl Skills {
    /// Skills derived from level; each one unlocks one level after the previous
    pub fn for_level(level: u32, survival_bonus: f32) -> Self {
        let level = level as f32;
        let derive = |offset: f32, rate: f32| ((level - offset) * rate).clamp(0.0, 1.0);
        Self {
            movement: derive(0.0, 0.2),
            awareness: derive(1.0, 0.25),
            combat: derive(2.0, 0.3),
            survival: (derive(3.0, 0.35) + survival_bonus).min(1.0),
        }
    }
}

/// Cumulative combat statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombatStats {
    pub kills: u32,
    pub deaths: u32,
    pub hits: u32,
    pub shots: u32,
    /// Milliseconds spent in the world
    pub play_time: f64,
}

/// Persisted progression record for one bot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillProfile {
    pub experience: u64,
    pub level: u32,
    pub skills: Skills,
    pub stats: CombatStats,
    /// Survival earned from repeated deaths, added on top of the level formula
    #[serde(default)]
    pub survival_bonus: f32,
}

impl Default for SkillProfile {
    fn default() -> Self {
        Self {
            experience: 0,
            level: 1,
            skills: Skills::default(),
            stats: CombatStats::default(),
            survival_bonus: 0.0,
        }
    }
}

impl SkillProfile {
    /// Fraction of shots that landed; zero before the first shot
    pub fn accuracy(&self) -> f32 {
        if self.stats.shots == 0 {
            0.0
        } else {
            self.stats.hits as f32 / self.stats.shots as f32
        }
    }
}

/// Read-only view used by monitoring
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BotStats {
    pub level: u32,
    pub experience: u64,
    pub skills: Skills,
    pub stats: CombatStats,
    pub kdr: f32,
}

impl From<&SkillProfile> for BotStats {
    fn from(profile: &SkillProfile) -> Self {
        Self {
            level: profile.level,
            experience: profile.experience,
            skills: profile.skills,
            stats: profile.stats.clone(),
            kdr: profile.stats.kills as f32 / profile.stats.deaths.max(1) as f32,
        }
    }
}

/// In-memory skill store with JSON persistence
#[derive(Debug, Default)]
pub struct SkillStore {
    profiles: BTreeMap<String, SkillProfile>,
}

impl SkillStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the store; a missing or unreadable document yields an empty store
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(store) => {
                info!(path = %path.display(), bots = store.len(), "Loaded bot skill store");
                store
            }
            Err(SkillStoreError::Io(e)) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "No bot skill store yet, starting fresh");
                Self::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Bot skill store unreadable, starting fresh");
                Self::new()
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, SkillStoreError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> Result<Self, SkillStoreError> {
        let profiles = serde_json::from_str(json)?;
        Ok(Self { profiles })
    }

    /// Serialize every profile into the persisted document
    pub fn to_json(&self) -> Result<String, SkillStoreError> {
        Ok(serde_json::to_string_pretty(&self.profiles)?)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, bot_id: &str) -> Option<&SkillProfile> {
        self.profiles.get(bot_id)
    }

    /// Skills for a bot, defaulting when it has no profile yet
    pub fn skills(&self, bot_id: &str) -> Skills {
        self.get(bot_id).map(|p| p.skills).unwrap_or_default()
    }

    /// Fetch or lazily create a profile
    pub fn ensure_profile(&mut self, bot_id: &str) -> &mut SkillProfile {
        if !self.profiles.contains_key(bot_id) {
            info!(bot_id, "Initialized new bot profile");
        }
        self.profiles.entry(bot_id.to_string()).or_default()
    }

    /// Add experience and re-derive level and skills
    pub fn grant_experience(&mut self, bot_id: &str, amount: u64) {
        let profile = self.ensure_profile(bot_id);
        let old_level = profile.level;

        profile.experience += amount;
        profile.level = (profile.experience / EXPERIENCE_PER_LEVEL) as u32 + 1;
        profile.skills = Skills::for_level(profile.level, profile.survival_bonus);

        if profile.level != old_level {
            info!(
                bot_id,
                level = profile.level,
                movement = profile.skills.movement,
                awareness = profile.skills.awareness,
                combat = profile.skills.combat,
                survival = profile.skills.survival,
                "Bot leveled up"
            );
        }
    }

    /// A snowball thrown by this bot
    pub fn record_shot(&mut self, bot_id: &str) {
        self.ensure_profile(bot_id).stats.shots += 1;
    }

    /// A snowball thrown by this bot struck someone
    pub fn record_hit(&mut self, bot_id: &str) {
        let profile = self.ensure_profile(bot_id);
        profile.stats.hits += 1;
        let accurate = profile.accuracy() > 0.5;

        self.grant_experience(bot_id, HIT_EXPERIENCE);
        if accurate {
            self.grant_experience(bot_id, ACCURACY_BONUS_EXPERIENCE);
        }
    }

    /// This bot knocked out the entity at `position`
    pub fn record_kill(&mut self, bot_id: &str, position: (f32, f32)) {
        let profile = self.ensure_profile(bot_id);
        profile.stats.kills += 1;
        let kills = profile.stats.kills;
        debug!(bot_id, x = position.0, y = position.1, kills, "Bot kill");

        self.grant_experience(bot_id, KILL_EXPERIENCE);
        if kills % 5 == 0 {
            self.grant_experience(bot_id, KILL_STREAK_EXPERIENCE);
            info!(bot_id, kills, "Bot kill streak");
        }
    }

    /// This bot was knocked out at `position`
    pub fn record_death(&mut self, bot_id: &str, position: (f32, f32)) {
        let profile = self.ensure_profile(bot_id);
        profile.stats.deaths += 1;
        let deaths = profile.stats.deaths;
        debug!(bot_id, x = position.0, y = position.1, deaths, "Bot death");

        self.grant_experience(bot_id, DEATH_EXPERIENCE);
        if deaths % 5 == 0 {
            let profile = self.ensure_profile(bot_id);
            profile.survival_bonus += DEATH_SURVIVAL_BONUS;
            profile.skills.survival = (profile.skills.survival + DEATH_SURVIVAL_BONUS).min(1.0);
            info!(bot_id, survival = profile.skills.survival, "Bot improved survival after deaths");
        }
    }

    /// Accumulate play time, granting passive experience per whole second
    pub fn record_play_time(&mut self, bot_id: &str, delta_ms: f32) {
        let stats = &mut self.ensure_profile(bot_id).stats;
        let before = (stats.play_time / 1000.0).floor();
        stats.play_time += f64::from(delta_ms.max(0.0));
        let seconds = ((stats.play_time / 1000.0).floor() - before) as u64;

        if seconds > 0 {
            self.grant_experience(bot_id, seconds * PLAYTIME_EXPERIENCE);
        }
    }

    pub fn bot_stats(&self, bot_id: &str) -> Option<BotStats> {
        self.get(bot_id).map(BotStats::from)
    }

    pub fn all_bot_stats(&self) -> BTreeMap<String, BotStats> {
        self.profiles
            .iter()
            .map(|(id, profile)| (id.clone(), BotStats::from(profile)))
            .collect()
    }
}

/// Write a serialized store next to `path` and atomically move it into place
pub async fn write_document(path: &Path, document: String) -> Result<(), SkillStoreError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, document).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Skill store persistence errors
#[derive(Debug, thiserror::Error)]
pub enum SkillStoreError {
    #[error("Skill store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Skill store document invalid: {0}")]
    Json(#[from] serde_json::Error),
}
