//! Reward tiers for completed public events.
//!
//! A participant's tier is the better of two independent results:
//!
//! - **Rank tier**: position in the contribution ranking. The top 10% (rounded
//!   up) earn gold, up to 25% cumulative earn silver, up to 50% cumulative
//!   earn bronze.
//! - **Score floor**: absolute contribution. 500+ is gold, 300+ silver,
//!   100+ bronze.
//!
//! Equal scores are ordered by earliest `joined_at`, then by character id,
//! so every participant gets a distinct, reproducible rank.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::CharacterId;

const GOLD_RANK_PERCENT: u64 = 10;
const SILVER_RANK_PERCENT: u64 = 25;
const BRONZE_RANK_PERCENT: u64 = 50;

const GOLD_SCORE_FLOOR: u64 = 500;
const SILVER_SCORE_FLOOR: u64 = 300;
const BRONZE_SCORE_FLOOR: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardTier {
    Participation,
    Bronze,
    Silver,
    Gold,
}

impl RewardTier {
    pub fn display_name(&self) -> &'static str {
        match self {
            RewardTier::Participation => "Participation",
            RewardTier::Bronze => "Bronze",
            RewardTier::Silver => "Silver",
            RewardTier::Gold => "Gold",
        }
    }

    /// Tier earned by position alone. `rank` is 1-based.
    pub fn for_rank(rank: usize, total: usize) -> RewardTier {
        if rank == 0 || rank > total {
            return RewardTier::Participation;
        }
        let rank = rank as u64;
        let total = total as u64;
        if rank <= cutoff(total, GOLD_RANK_PERCENT) {
            RewardTier::Gold
        } else if rank <= cutoff(total, SILVER_RANK_PERCENT) {
            RewardTier::Silver
        } else if rank <= cutoff(total, BRONZE_RANK_PERCENT) {
            RewardTier::Bronze
        } else {
            RewardTier::Participation
        }
    }

    /// Tier guaranteed by absolute contribution.
    pub fn for_score(score: u64) -> RewardTier {
        if score >= GOLD_SCORE_FLOOR {
            RewardTier::Gold
        } else if score >= SILVER_SCORE_FLOOR {
            RewardTier::Silver
        } else if score >= BRONZE_SCORE_FLOOR {
            RewardTier::Bronze
        } else {
            RewardTier::Participation
        }
    }
}

impl fmt::Display for RewardTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// ceil(total * percent / 100) without floating point.
fn cutoff(total: u64, percent: u64) -> u64 {
    (total * percent).div_ceil(100)
}

/// Input row for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingEntry {
    pub character_id: CharacterId,
    pub contribution_score: u64,
    pub joined_at: DateTime<Utc>,
}

/// Computed tier for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardAssignment {
    pub character_id: CharacterId,
    /// 1-based position in the contribution ranking
    pub rank: usize,
    pub contribution_score: u64,
    pub tier: RewardTier,
}

/// Ranking order: score descending, then earliest join, then character id.
pub fn ranking_order(a: &RankingEntry, b: &RankingEntry) -> Ordering {
    b.contribution_score
        .cmp(&a.contribution_score)
        .then_with(|| a.joined_at.cmp(&b.joined_at))
        .then_with(|| a.character_id.cmp(&b.character_id))
}

/// Rank every entry and assign the more generous of rank tier and score floor.
pub fn assign_reward_tiers(mut entries: Vec<RankingEntry>) -> Vec<RewardAssignment> {
    entries.sort_by(ranking_order);
    let total = entries.len();

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let rank = index + 1;
            let tier = RewardTier::for_rank(rank, total)
                .max(RewardTier::for_score(entry.contribution_score));
            RewardAssignment {
                character_id: entry.character_id,
                rank,
                contribution_score: entry.contribution_score,
                tier,
            }
        })
        .collect()
}
