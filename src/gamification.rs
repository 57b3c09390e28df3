//! Professionalism levels derived from experience points.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::identity::{FreelancerProfile, User};

/// Largest XP grant the API accepts in one award.
pub const MAX_XP_AWARD: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Novice,
    Intermediate,
    Expert,
    Master,
    Legend,
}

impl Level {
    pub const ORDER: [Level; 5] = [Level::Novice, Level::Intermediate, Level::Expert, Level::Master, Level::Legend];

    /// Minimum XP for the level.
    pub fn threshold(&self) -> u64 {
        match self {
            Level::Novice => 0,
            Level::Intermediate => 100,
            Level::Expert => 250,
            Level::Master => 500,
            Level::Legend => 1000,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Novice => "novice",
            Level::Intermediate => "intermediate",
            Level::Expert => "expert",
            Level::Master => "master",
            Level::Legend => "legend",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Level::Novice => "Novice",
            Level::Intermediate => "Intermediate",
            Level::Expert => "Expert",
            Level::Master => "Master",
            Level::Legend => "Legend",
        }
    }

    pub fn next(&self) -> Option<Level> {
        let idx = Self::ORDER.iter().position(|l| l == self)?;
        Self::ORDER.get(idx + 1).copied()
    }

    pub fn for_xp(xp: u64) -> Level {
        Self::ORDER.into_iter().rev().find(|l| xp >= l.threshold()).unwrap_or_default()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Level::ORDER
            .into_iter()
            .find(|l| l.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown level '{}'", s))
    }
}

/// Percent of the way from `level`'s threshold to the next one, rounded and clamped
/// to 0..=100. The top level is always 100.
pub fn progress_for_xp(xp: u64, level: Option<Level>) -> u32 {
    let level = level.unwrap_or_else(|| Level::for_xp(xp));
    let Some(next) = level.next() else { return 100 };
    let (lo, hi) = (level.threshold(), next.threshold());
    if hi <= lo {
        return 100;
    }
    let pct = (xp as f64 - lo as f64) / (hi - lo) as f64 * 100.0;
    pct.round().clamp(0.0, 100.0) as u32
}

/// What a profile badge shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub level: Level,
    pub progress: u32,
    pub xp: u64,
    pub completed_projects: u32,
    pub rating: f64,
}

impl Standing {
    /// Server-supplied values win over derived ones: user first, then freelancer
    /// profile, then computed from XP.
    pub fn derive(user: Option<&User>, freelancer: Option<&FreelancerProfile>) -> Self {
        let xp = user.and_then(|u| u.xp).unwrap_or(0);
        let level = user
            .and_then(|u| u.level.as_deref())
            .or_else(|| freelancer.and_then(|f| f.level.as_deref()))
            .and_then(|l| l.parse().ok())
            .unwrap_or_else(|| Level::for_xp(xp));
        let progress = user
            .and_then(|u| u.professionalism)
            .or_else(|| freelancer.and_then(|f| f.professionalism))
            .unwrap_or_else(|| progress_for_xp(xp, Some(level)));
        Self {
            level,
            progress,
            xp,
            completed_projects: freelancer.and_then(|f| f.completed_projects).unwrap_or(0),
            rating: freelancer.and_then(|f| f.rating).unwrap_or(0.0),
        }
    }
}
