use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lariat_core::ServiceError;

// ---------------------------------------------------------------------------
// LeadStage
// ---------------------------------------------------------------------------

/// Funnel stage of a lead.
///
/// ```text
/// NEW → CONTACTED → ENGAGED → QUALIFIED → PROPOSAL → NEGOTIATION → CONVERTED
///                                                                → LOST
/// ```
///
/// CONVERTED and LOST are terminal — the analytics core never reassigns
/// them, and terminal leads are excluded from follow-up recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStage {
    New,
    Contacted,
    Engaged,
    Qualified,
    Proposal,
    Negotiation,
    Converted,
    Lost,
}

impl LeadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Contacted => "CONTACTED",
            Self::Engaged => "ENGAGED",
            Self::Qualified => "QUALIFIED",
            Self::Proposal => "PROPOSAL",
            Self::Negotiation => "NEGOTIATION",
            Self::Converted => "CONVERTED",
            Self::Lost => "LOST",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(Self::New),
            "CONTACTED" => Some(Self::Contacted),
            "ENGAGED" => Some(Self::Engaged),
            "QUALIFIED" => Some(Self::Qualified),
            "PROPOSAL" => Some(Self::Proposal),
            "NEGOTIATION" => Some(Self::Negotiation),
            "CONVERTED" => Some(Self::Converted),
            "LOST" => Some(Self::Lost),
            _ => None,
        }
    }

    /// Whether the lead has reached a terminal stage.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Lost)
    }

    /// Ranking weight — later funnel stages score higher. Terminal stages
    /// never enter the ranker, but map to 0 anyway.
    pub fn funnel_weight(&self) -> i64 {
        match self {
            Self::New => 1,
            Self::Contacted => 2,
            Self::Engaged => 3,
            Self::Qualified => 4,
            Self::Proposal => 5,
            Self::Negotiation => 6,
            Self::Converted | Self::Lost => 0,
        }
    }
}

impl std::fmt::Display for LeadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Persisted records
// ---------------------------------------------------------------------------

/// A lead — the unit every analytic surface is computed over.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Acquisition source tag ("referral", "web", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub stage: LeadStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Interaction channel of a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Call,
    Email,
    Meeting,
    Note,
}

impl ConversationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Email => "email",
            Self::Meeting => "meeting",
            Self::Note => "note",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "call" => Some(Self::Call),
            "email" => Some(Self::Email),
            "meeting" => Some(Self::Meeting),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

/// A logged interaction with a lead. Event source for staleness scoring
/// and for follow-up task derivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub lead_id: String,
    pub kind: ConversationKind,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub has_follow_up: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follow_up_done: bool,
}

/// A standalone reminder. Together with open conversation follow-ups this
/// feeds the priority task list. Consumed read-only by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    pub title: String,
    pub due_date: DateTime<Utc>,
    /// Numeric priority, higher is more important.
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

/// A persisted lead lifecycle event: creation (stage NEW) or a stage change.
///
/// The timeline is bucketed over these rather than over current lead state,
/// so historical buckets stay stable as a lead progresses through the funnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub id: String,
    pub owner_id: String,
    pub lead_id: String,
    pub stage: LeadStage,
    pub at: DateTime<Utc>,
}

/// Category of a notification, a thin tag for client rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Lead,
    Conversation,
    Reminder,
    System,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Conversation => "conversation",
            Self::Reminder => "reminder",
            Self::System => "system",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "lead" => Some(Self::Lead),
            "conversation" => Some(Self::Conversation),
            "reminder" => Some(Self::Reminder),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// A durable notification row.
///
/// Lifecycle: created Unread by a domain event, `is_read` flips false→true
/// exactly once (mark-read / mark-all-read), deletion is terminal from any
/// state. Never resurrected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(default)]
    pub is_read: bool,
    /// Weak reference to the originating entity — lookup only, no ownership.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Derived surfaces (recomputed per request, never persisted)
// ---------------------------------------------------------------------------

/// Funnel counts and conversion rate over a period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuickStats {
    pub total_leads: i64,
    pub contacted_leads: i64,
    pub converted_leads: i64,
    pub lost_leads: i64,
    pub new_leads_this_week: i64,
    /// convertedLeads / totalLeads; 0 when totalLeads is 0.
    pub conversion_rate: f64,
}

/// QuickStats extended with conversation and task counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewStats {
    #[serde(flatten)]
    pub stats: QuickStats,
    pub total_conversations: i64,
    pub pending_tasks: i64,
    pub today_tasks: i64,
    pub overdue_tasks: i64,
}

/// One timeline bucket. Exactly one label shape is populated, matching the
/// requested timeframe: `date` for daily, `weekStart`/`weekEnd` for weekly,
/// `month`/`year` for monthly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week_end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    pub new: i64,
    pub contacted: i64,
    pub converted: i64,
    pub lost: i64,
}

/// One month of a historical metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthCount {
    /// 1-based calendar month.
    pub month: u32,
    pub year: i32,
    pub count: i64,
}

/// A ranked follow-up recommendation for one lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub lead_id: String,
    pub lead_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Composite follow-up score (higher = more urgent).
    pub priority: i64,
    pub stage: LeadStage,
    pub action: String,
    pub reason: String,
}

/// Urgency bucket of a priority task, by UTC day boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskUrgency {
    Overdue,
    Today,
    Upcoming,
}

impl TaskUrgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Overdue => "overdue",
            Self::Today => "today",
            Self::Upcoming => "upcoming",
        }
    }
}

/// One entry of the priority task list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityTask {
    pub id: String,
    pub title: String,
    pub due_date: DateTime<Utc>,
    pub priority: i64,
    pub status: TaskUrgency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_name: Option<String>,
}

/// Composite payload of `GET /overview`. All-or-nothing: produced only when
/// every sub-fetch succeeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub metrics: OverviewStats,
    pub timeline: Vec<TimelinePoint>,
    pub recommendations: Vec<Recommendation>,
    pub priority_tasks: Vec<PriorityTask>,
}

// ---------------------------------------------------------------------------
// Boundary query parameters
// ---------------------------------------------------------------------------
//
// Loosely-typed HTTP query strings are parsed into strict, range-checked
// specs here. Invalid input never reaches the aggregation code.

/// Timeline granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeframe {
    Daily,
    Weekly,
    Monthly,
}

impl Timeframe {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "monthly" => Some(Self::Monthly),
            _ => None,
        }
    }

    /// Bucket width in days used for the bucket-count formula. Monthly
    /// buckets align to calendar months; 30 is the nominal width.
    pub fn bucket_width_days(&self) -> i64 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 7,
            Self::Monthly => 30,
        }
    }
}

/// Historical metric selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMetric {
    Leads,
    Conversations,
    Conversions,
}

impl HistoryMetric {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "leads" => Some(Self::Leads),
            "conversations" => Some(Self::Conversations),
            "conversions" => Some(Self::Conversions),
            _ => None,
        }
    }
}

/// Raw query string for `GET /timeline`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineQuery {
    #[serde(default)]
    pub timeframe: Option<String>,
    #[serde(default)]
    pub days: Option<i64>,
}

/// Validated timeline request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineSpec {
    pub timeframe: Timeframe,
    pub days: i64,
}

impl TimelineSpec {
    pub const DEFAULT_DAYS: i64 = 30;

    pub fn parse(query: &TimelineQuery) -> Result<Self, ServiceError> {
        let timeframe = match query.timeframe.as_deref() {
            None => Timeframe::Daily,
            Some(s) => Timeframe::from_str(s).ok_or_else(|| {
                ServiceError::Validation(format!(
                    "timeframe must be daily|weekly|monthly, got '{s}'"
                ))
            })?,
        };
        let days = query.days.unwrap_or(Self::DEFAULT_DAYS);
        if !(1..=365).contains(&days) {
            return Err(ServiceError::Validation(format!(
                "days must be in 1..=365, got {days}"
            )));
        }
        Ok(Self { timeframe, days })
    }
}

/// Raw query string for `GET /metrics/history`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    #[serde(default)]
    pub metric: Option<String>,
    #[serde(default)]
    pub months: Option<i64>,
}

/// Validated history request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistorySpec {
    pub metric: HistoryMetric,
    pub months: i64,
}

impl HistorySpec {
    pub const DEFAULT_MONTHS: i64 = 6;
    pub const MAX_MONTHS: i64 = 60;

    pub fn parse(query: &HistoryQuery) -> Result<Self, ServiceError> {
        let metric = match query.metric.as_deref() {
            None => HistoryMetric::Leads,
            Some(s) => HistoryMetric::from_str(s).ok_or_else(|| {
                ServiceError::Validation(format!(
                    "metric must be leads|conversations|conversions, got '{s}'"
                ))
            })?,
        };
        // Out-of-range months clamp rather than reject; the series length
        // is a presentation knob, not a correctness input.
        let months = query
            .months
            .unwrap_or(Self::DEFAULT_MONTHS)
            .clamp(1, Self::MAX_MONTHS);
        Ok(Self { metric, months })
    }
}

/// `?limit=N` for recommendations and priority tasks.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitQuery {
    #[serde(default)]
    pub limit: Option<i64>,
}

impl LimitQuery {
    pub const DEFAULT_LIMIT: usize = 5;
    pub const MAX_LIMIT: i64 = 100;

    pub fn resolve(&self) -> Result<usize, ServiceError> {
        match self.limit {
            None => Ok(Self::DEFAULT_LIMIT),
            Some(n) if (1..=Self::MAX_LIMIT).contains(&n) => Ok(n as usize),
            Some(n) => Err(ServiceError::Validation(format!(
                "limit must be in 1..={}, got {n}",
                Self::MAX_LIMIT
            ))),
        }
    }
}

/// Query string for `GET /notifications`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListQuery {
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub count_only: Option<bool>,
    #[serde(default)]
    pub unread_only: Option<bool>,
}

// ---------------------------------------------------------------------------
// Store filters
// ---------------------------------------------------------------------------

/// Half-open `[start, end)` UTC interval.
pub type TimeRange = (DateTime<Utc>, DateTime<Utc>);

#[derive(Debug, Default, Clone)]
pub struct LeadFilter {
    /// Only leads created within the range.
    pub created_in: Option<TimeRange>,
    /// Exclude terminal stages (CONVERTED / LOST).
    pub active_only: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ConversationFilter {
    pub lead_id: Option<String>,
    /// Only conversations dated within the range.
    pub date_in: Option<TimeRange>,
    /// Only conversations with an open follow-up (hasFollowUp && !followUpDone).
    pub open_follow_up: bool,
}

#[derive(Debug, Default, Clone)]
pub struct ReminderFilter {
    /// Only reminders not yet done.
    pub open_only: bool,
}

#[derive(Debug, Default, Clone)]
pub struct StageEventFilter {
    /// Only events within the range.
    pub at_in: Option<TimeRange>,
}

#[derive(Debug, Default, Clone)]
pub struct NotificationFilter {
    pub unread_only: bool,
    /// Newest first, capped to this many rows.
    pub limit: Option<usize>,
}
