use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

/// Named daily activity counters reported for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    LoginStreak,
    PostsCreated,
    CommentsWritten,
    UpvotesReceived,
    QuizzesCompleted,
    BuddiesMessaged,
    KarmaSpent,
    KarmaEarnedToday,
}

impl MetricKey {
    pub const ALL: [MetricKey; 8] = [
        MetricKey::LoginStreak,
        MetricKey::PostsCreated,
        MetricKey::CommentsWritten,
        MetricKey::UpvotesReceived,
        MetricKey::QuizzesCompleted,
        MetricKey::BuddiesMessaged,
        MetricKey::KarmaSpent,
        MetricKey::KarmaEarnedToday,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::LoginStreak => "login_streak",
            MetricKey::PostsCreated => "posts_created",
            MetricKey::CommentsWritten => "comments_written",
            MetricKey::UpvotesReceived => "upvotes_received",
            MetricKey::QuizzesCompleted => "quizzes_completed",
            MetricKey::BuddiesMessaged => "buddies_messaged",
            MetricKey::KarmaSpent => "karma_spent",
            MetricKey::KarmaEarnedToday => "karma_earned_today",
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a metric name does not match any known counter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl FromStr for MetricKey {
    type Err = UnknownMetric;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| UnknownMetric(value.to_string()))
    }
}

/// One day of activity for a single user. Missing counters default to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DailyMetrics {
    pub login_streak: u32,
    pub posts_created: u32,
    pub comments_written: u32,
    pub upvotes_received: u32,
    pub quizzes_completed: u32,
    pub buddies_messaged: u32,
    pub karma_spent: u32,
    pub karma_earned_today: u32,
}

impl DailyMetrics {
    pub fn value(&self, key: MetricKey) -> u32 {
        match key {
            MetricKey::LoginStreak => self.login_streak,
            MetricKey::PostsCreated => self.posts_created,
            MetricKey::CommentsWritten => self.comments_written,
            MetricKey::UpvotesReceived => self.upvotes_received,
            MetricKey::QuizzesCompleted => self.quizzes_completed,
            MetricKey::BuddiesMessaged => self.buddies_messaged,
            MetricKey::KarmaSpent => self.karma_spent,
            MetricKey::KarmaEarnedToday => self.karma_earned_today,
        }
    }

    pub fn set(&mut self, key: MetricKey, value: u32) {
        let slot = match key {
            MetricKey::LoginStreak => &mut self.login_streak,
            MetricKey::PostsCreated => &mut self.posts_created,
            MetricKey::CommentsWritten => &mut self.comments_written,
            MetricKey::UpvotesReceived => &mut self.upvotes_received,
            MetricKey::QuizzesCompleted => &mut self.quizzes_completed,
            MetricKey::BuddiesMessaged => &mut self.buddies_messaged,
            MetricKey::KarmaSpent => &mut self.karma_spent,
            MetricKey::KarmaEarnedToday => &mut self.karma_earned_today,
        };
        *slot = value;
    }
}

/// Scarcity classification of a granted box, ordered from most to least common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RarityTier {
    Common,
    Rare,
    Elite,
    Legendary,
}

impl RarityTier {
    /// Fixed sampling order.
    pub const ALL: [RarityTier; 4] = [
        RarityTier::Common,
        RarityTier::Rare,
        RarityTier::Elite,
        RarityTier::Legendary,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            RarityTier::Common => "common",
            RarityTier::Rare => "rare",
            RarityTier::Elite => "elite",
            RarityTier::Legendary => "legendary",
        }
    }

    pub fn karma_multiplier(&self) -> f64 {
        match self {
            RarityTier::Common => 1.0,
            RarityTier::Rare => 1.25,
            RarityTier::Elite => 1.5,
            RarityTier::Legendary => 2.0,
        }
    }
}

impl fmt::Display for RarityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar facts about the decision date used for seasonal scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalContext {
    pub month: u32,
    pub weekday: Weekday,
}

impl TemporalContext {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            weekday: date.weekday(),
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday, Weekday::Sat | Weekday::Sun)
    }
}

/// Terminal state reached by a single decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Delivered,
    AlreadyReceived,
    NoMatch,
    Missed,
}

impl DecisionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DecisionStatus::Delivered => "delivered",
            DecisionStatus::AlreadyReceived => "already_received",
            DecisionStatus::NoMatch => "no_match",
            DecisionStatus::Missed => "missed",
        }
    }

    /// Fixed reason for outcomes that do not grant a box.
    pub fn denial_reason(&self) -> Option<&'static str> {
        match self {
            DecisionStatus::Delivered => None,
            DecisionStatus::AlreadyReceived => Some("already rewarded"),
            DecisionStatus::NoMatch => Some("no rule matched"),
            DecisionStatus::Missed => Some("below probability threshold"),
        }
    }
}

/// Engine output for one user/day. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDecision {
    pub user_id: String,
    pub date: NaiveDate,
    pub granted: bool,
    pub status: DecisionStatus,
    pub box_type: Option<String>,
    pub box_name: Option<String>,
    pub rarity: Option<RarityTier>,
    pub karma: u32,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RewardDecision {
    pub(crate) fn denied(user_id: &str, date: NaiveDate, status: DecisionStatus) -> Self {
        let reason = status.denial_reason().unwrap_or_default();
        Self {
            user_id: user_id.to_string(),
            date,
            granted: false,
            status,
            box_type: None,
            box_name: None,
            rarity: None,
            karma: 0,
            reason: reason.to_string(),
            warnings: Vec::new(),
        }
    }

    pub fn already_rewarded(user_id: &str, date: NaiveDate) -> Self {
        Self::denied(user_id, date, DecisionStatus::AlreadyReceived)
    }
}
