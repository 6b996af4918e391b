use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use super::check_text;
use crate::error::{AppError, AppResult};

text_enum! {
    /// Which direction wins: a dyno number wants the highest value, a quarter-mile
    /// time wants the lowest.
    pub enum RankingOrder {
        HigherIsBetter => "HIGHER_IS_BETTER",
        LowerIsBetter => "LOWER_IS_BETTER",
    }
}

impl Default for RankingOrder {
    fn default() -> Self {
        RankingOrder::HigherIsBetter
    }
}

impl RankingOrder {
    /// True when `candidate` beats `current`.
    pub fn improves(&self, candidate: f64, current: f64) -> bool {
        match self {
            RankingOrder::HigherIsBetter => candidate > current,
            RankingOrder::LowerIsBetter => candidate < current,
        }
    }
}

/// Challenge
///
/// A timed club competition (`challenges` table). Participants submit entries for
/// `metric` (in `unit`) between `starts_at` and `ends_at`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Challenge {
    pub id: Uuid,
    pub club_id: Uuid,
    pub created_by: String,
    pub title: String,
    pub description: String,
    pub metric: String,
    pub unit: String,
    #[sqlx(try_from = "String")]
    pub ranking: RankingOrder,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

impl Challenge {
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        self.ends_at <= now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct ChallengeParticipant {
    pub challenge_id: Uuid,
    pub user_id: String,
    #[ts(type = "string")]
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct LeaderboardEntry {
    pub id: Uuid,
    pub challenge_id: Uuid,
    pub user_id: String,
    pub value: f64,
    pub proof_url: Option<String>,
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct ChallengeView {
    pub challenge: Challenge,
    pub participant_count: i64,
    pub viewer_joined: bool,
}

/// LeaderboardRow
///
/// One ranked line of a challenge leaderboard: a user's best entry.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct LeaderboardRow {
    pub rank: u32,
    pub user_id: String,
    pub display_name: String,
    pub best_value: f64,
    pub proof_url: Option<String>,
    #[ts(type = "string")]
    pub submitted_at: DateTime<Utc>,
}

/// Builds a leaderboard from raw entries.
///
/// Keeps each user's best entry per `ranking` (the earlier submission wins an exact
/// tie), sorts best-first with earlier submissions ahead on equal values, and assigns
/// 1-based ranks by position. `names` maps user ids to display names; unknown ids
/// fall back to the id itself.
pub fn rank_entries(
    entries: &[LeaderboardEntry],
    ranking: RankingOrder,
    names: &HashMap<String, String>,
    limit: usize,
) -> Vec<LeaderboardRow> {
    let mut best: HashMap<&str, &LeaderboardEntry> = HashMap::new();
    for entry in entries {
        best.entry(entry.user_id.as_str())
            .and_modify(|current| {
                let better = ranking.improves(entry.value, current.value)
                    || (entry.value == current.value && entry.submitted_at < current.submitted_at);
                if better {
                    *current = entry;
                }
            })
            .or_insert(entry);
    }

    let mut winners: Vec<&LeaderboardEntry> = best.into_values().collect();
    winners.sort_by(|a, b| {
        let by_value = match ranking {
            RankingOrder::HigherIsBetter => b.value.total_cmp(&a.value),
            RankingOrder::LowerIsBetter => a.value.total_cmp(&b.value),
        };
        by_value.then_with(|| a.submitted_at.cmp(&b.submitted_at))
    });

    winners
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, entry)| LeaderboardRow {
            rank: idx as u32 + 1,
            user_id: entry.user_id.clone(),
            display_name: names
                .get(&entry.user_id)
                .cloned()
                .unwrap_or_else(|| entry.user_id.clone()),
            best_value: entry.value,
            proof_url: entry.proof_url.clone(),
            submitted_at: entry.submitted_at,
        })
        .collect()
}

// --- Request payloads ---

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateChallengeRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub metric: String,
    pub unit: String,
    #[serde(default)]
    pub ranking: RankingOrder,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub ends_at: DateTime<Utc>,
}

impl CreateChallengeRequest {
    pub fn validate(&self) -> AppResult<()> {
        check_text("title", &self.title, 1, 120)?;
        check_text("metric", &self.metric, 1, 60)?;
        check_text("unit", &self.unit, 1, 20)?;
        if self.ends_at <= self.starts_at {
            return Err(AppError::validation("ends_at must be after starts_at"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct SubmitEntryRequest {
    pub value: f64,
    pub proof_url: Option<String>,
}

impl SubmitEntryRequest {
    pub fn validate(&self) -> AppResult<()> {
        if !self.value.is_finite() || self.value < 0.0 {
            return Err(AppError::validation(
                "value must be a finite, non-negative number",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct LeaderboardQuery {
    pub limit: Option<usize>,
}

impl LeaderboardQuery {
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(user: &str, value: f64, offset_secs: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            id: Uuid::new_v4(),
            challenge_id: Uuid::nil(),
            user_id: user.to_string(),
            value,
            proof_url: None,
            submitted_at: DateTime::<Utc>::UNIX_EPOCH + Duration::seconds(offset_secs),
        }
    }

    #[test]
    fn keeps_best_entry_per_user_for_lower_is_better() {
        let entries = vec![
            entry("alice", 12.4, 1),
            entry("bob", 11.9, 2),
            entry("alice", 11.7, 3),
            entry("bob", 12.8, 4),
        ];
        let rows = rank_entries(&entries, RankingOrder::LowerIsBetter, &HashMap::new(), 10);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].user_id, "alice");
        assert_eq!(rows[0].best_value, 11.7);
        assert_eq!(rows[0].rank, 1);
        assert_eq!(rows[1].user_id, "bob");
        assert_eq!(rows[1].best_value, 11.9);
    }

    #[test]
    fn ties_go_to_earlier_submission() {
        let entries = vec![entry("late", 400.0, 50), entry("early", 400.0, 10)];
        let rows = rank_entries(&entries, RankingOrder::HigherIsBetter, &HashMap::new(), 10);
        assert_eq!(rows[0].user_id, "early");
        assert_eq!(rows[1].user_id, "late");
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn display_names_and_limit_apply() {
        let entries = vec![entry("u1", 300.0, 1), entry("u2", 350.0, 2), entry("u3", 320.0, 3)];
        let names = HashMap::from([("u2".to_string(), "Dyno Dan".to_string())]);
        let rows = rank_entries(&entries, RankingOrder::HigherIsBetter, &names, 2);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display_name, "Dyno Dan");
        assert_eq!(rows[1].display_name, "u3");
    }
}
