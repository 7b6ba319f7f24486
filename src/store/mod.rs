//! Persistent stores

pub mod skills;

pub use skills::SkillStore;
