//! Skill catalog entries.

use serde::Serialize;
use utoipa::ToSchema;

use super::SkillId;

/// A teachable skill. Seeded at setup and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Skill {
    /// Skill identifier.
    pub id: SkillId,
    /// Display name (unique).
    pub name: String,
    /// Category used for browsing (e.g. `"Music"`).
    pub category: String,
}

/// Which side of a profile's skill set a skill belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkillRole {
    /// The user can teach this skill.
    Teaches,
    /// The user wants to learn this skill.
    Learns,
}

/// Name and category pairs seeded into a fresh store.
///
/// Kept in sync with the `INSERT INTO skills` block of the initial
/// migration.
pub const DEFAULT_CATALOG: &[(&str, &str)] = &[
    ("Guitar", "Music"),
    ("Piano", "Music"),
    ("Singing", "Music"),
    ("Spanish", "Languages"),
    ("French", "Languages"),
    ("Japanese", "Languages"),
    ("Python", "Programming"),
    ("JavaScript", "Programming"),
    ("Rust", "Programming"),
    ("Photography", "Arts"),
    ("Drawing", "Arts"),
    ("Cooking", "Lifestyle"),
    ("Yoga", "Fitness"),
    ("Public Speaking", "Business"),
    ("Data Analysis", "Business"),
];

/// Builds [`Skill`] rows with fresh ids for [`DEFAULT_CATALOG`].
#[must_use]
pub fn default_catalog() -> Vec<Skill> {
    DEFAULT_CATALOG
        .iter()
        .map(|(name, category)| Skill {
            id: SkillId::new(),
            name: (*name).to_string(),
            category: (*category).to_string(),
        })
        .collect()
}
