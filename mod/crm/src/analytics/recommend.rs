//! Follow-up recommendations — deterministic scoring and ranking.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use tracing::warn;

use lariat_core::ServiceError;

use crate::model::{ConversationFilter, Lead, LeadFilter, LeadStage, Recommendation};
use crate::store::RecordStore;

/// Staleness contribution is capped at this many days.
pub const STALENESS_CAP_DAYS: i64 = 30;
/// Fixed bonus for a lead with an open follow-up.
pub const FOLLOW_UP_BONUS: i64 = 15;
/// Multiplier on the funnel stage weight.
pub const STAGE_MULTIPLIER: i64 = 10;

/// The scoring inputs for one lead, also handed to the suggestion
/// collaborator so its text can reference what dominated the score.
#[derive(Debug, Clone, Copy)]
pub struct ScoreFactors {
    pub stage_weight: i64,
    pub staleness_days: i64,
    pub open_follow_up: bool,
}

impl ScoreFactors {
    pub fn score(&self) -> i64 {
        self.stage_weight * STAGE_MULTIPLIER
            + self.staleness_days.min(STALENESS_CAP_DAYS)
            + if self.open_follow_up { FOLLOW_UP_BONUS } else { 0 }
    }
}

/// Action/reason text for one recommendation.
#[derive(Debug, Clone)]
pub struct Suggestion {
    pub action: String,
    pub reason: String,
}

/// External collaborator producing the human-readable action/reason text.
///
/// Ranking order is owned by this module and never depends on the
/// collaborator: when `suggest` fails, the built-in text derived from the
/// score factors is used instead.
pub trait SuggestionProvider: Send + Sync {
    fn suggest(&self, lead: &Lead, factors: &ScoreFactors) -> Result<Suggestion, ServiceError>;
}

/// Built-in suggestion text, also the fallback for a failing provider.
pub struct StaticSuggestions;

impl SuggestionProvider for StaticSuggestions {
    fn suggest(&self, lead: &Lead, factors: &ScoreFactors) -> Result<Suggestion, ServiceError> {
        Ok(local_suggestion(lead, factors))
    }
}

fn local_suggestion(lead: &Lead, factors: &ScoreFactors) -> Suggestion {
    let action = match lead.stage {
        LeadStage::New => "Make first contact",
        LeadStage::Contacted => "Follow up via email",
        LeadStage::Engaged => "Schedule a call",
        LeadStage::Qualified => "Prepare a proposal",
        LeadStage::Proposal => "Chase the proposal",
        LeadStage::Negotiation => "Push to close",
        // Terminal stages never reach the ranker.
        LeadStage::Converted | LeadStage::Lost => "Review the account",
    }
    .to_string();

    let reason = if factors.open_follow_up {
        "Has an open follow-up".to_string()
    } else if factors.staleness_days >= STALENESS_CAP_DAYS {
        format!("No contact for {}+ days", STALENESS_CAP_DAYS)
    } else if factors.staleness_days > 0 {
        format!("No contact for {} days", factors.staleness_days)
    } else {
        format!("In {} stage", lead.stage)
    };

    Suggestion { action, reason }
}

/// Ranked follow-up recommendations for an owner.
///
/// Scope: non-terminal leads only. Sorted by score descending; ties broken
/// by lead creation date ascending (oldest first), then id, so the order is
/// fully deterministic. Truncated to `limit` after sorting.
pub fn recommendations(
    store: &dyn RecordStore,
    suggester: &dyn SuggestionProvider,
    owner_id: &str,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Recommendation>, ServiceError> {
    let leads = store.find_leads(
        owner_id,
        &LeadFilter {
            active_only: true,
            ..Default::default()
        },
    )?;

    // One pass over all conversations: last-contact date and open
    // follow-ups per lead.
    let conversations =
        store.find_conversations(owner_id, &ConversationFilter::default())?;
    let mut last_contact: HashMap<String, DateTime<Utc>> = HashMap::new();
    let mut open_follow_up: HashSet<String> = HashSet::new();
    for conv in &conversations {
        let entry = last_contact
            .entry(conv.lead_id.clone())
            .or_insert(conv.date);
        if conv.date > *entry {
            *entry = conv.date;
        }
        if conv.has_follow_up && !conv.follow_up_done {
            open_follow_up.insert(conv.lead_id.clone());
        }
    }

    let mut scored: Vec<(Lead, ScoreFactors)> = leads
        .into_iter()
        .map(|lead| {
            // Never contacted: staleness runs from the lead's creation.
            let since = last_contact.get(&lead.id).copied().unwrap_or(lead.created_at);
            let factors = ScoreFactors {
                stage_weight: lead.stage.funnel_weight(),
                staleness_days: (now - since).num_days().max(0),
                open_follow_up: open_follow_up.contains(&lead.id),
            };
            (lead, factors)
        })
        .collect();

    scored.sort_by(|(a, fa), (b, fb)| {
        fb.score()
            .cmp(&fa.score())
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
    scored.truncate(limit);

    Ok(scored
        .into_iter()
        .map(|(lead, factors)| {
            let suggestion = suggester.suggest(&lead, &factors).unwrap_or_else(|e| {
                warn!(owner_id, lead_id = %lead.id, "suggestion provider failed: {e}");
                local_suggestion(&lead, &factors)
            });
            Recommendation {
                lead_id: lead.id,
                lead_name: lead.name,
                company: lead.company,
                priority: factors.score(),
                stage: lead.stage,
                action: suggestion.action,
                reason: suggestion.reason,
            }
        })
        .collect())
}
