//! Demo data seeding for local development.
//!
//! Populates a handful of leads at various pipeline stages, conversations
//! with open follow-ups, reminders, and notifications for one owner so the
//! dashboard surfaces render something on first run.

use chrono::{Duration, Utc};
use lariat_core::new_id;
use lariat_crm::model::{
    Conversation, ConversationKind, Lead, LeadStage, NotificationKind, Reminder,
};
use lariat_crm::notify::NewNotification;
use lariat_crm::CrmModule;
use tracing::info;

pub fn seed_demo(module: &CrmModule, owner: &str) -> anyhow::Result<()> {
    let store = module.store();
    let now = Utc::now();

    let companies = [
        ("Acme Corp", LeadStage::New, 2),
        ("Globex", LeadStage::Contacted, 9),
        ("Initech", LeadStage::Qualified, 16),
        ("Umbrella", LeadStage::Negotiation, 25),
        ("Stark Industries", LeadStage::Converted, 40),
        ("Wayne Enterprises", LeadStage::Lost, 55),
    ];

    for (name, stage, age_days) in companies {
        let created = now - Duration::days(age_days);
        let lead = Lead {
            id: new_id(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            company: Some(name.to_string()),
            email: Some(format!(
                "contact@{}.example",
                name.to_lowercase().replace(' ', "-")
            )),
            source: Some("referral".to_string()),
            stage: LeadStage::New,
            created_at: created,
            updated_at: created,
        };
        store.insert_lead(&lead)?;
        if stage != LeadStage::New {
            // Walk the journal forward so timeline buckets see real transitions.
            store.update_lead_stage(&lead.id, owner, stage, created + Duration::days(3))?;
        }

        store.insert_conversation(&Conversation {
            id: new_id(),
            owner_id: owner.to_string(),
            lead_id: lead.id.clone(),
            kind: ConversationKind::Call,
            date: created + Duration::days(1),
            notes: Some("Intro call".to_string()),
            has_follow_up: stage == LeadStage::Qualified,
            follow_up_date: (stage == LeadStage::Qualified).then(|| now + Duration::days(2)),
            follow_up_done: false,
        })?;
    }

    store.insert_reminder(&Reminder {
        id: new_id(),
        owner_id: owner.to_string(),
        lead_id: None,
        title: "Send Q3 pricing sheet".to_string(),
        due_date: now - Duration::days(1),
        priority: 2,
        done: false,
        created_at: now - Duration::days(4),
    })?;
    store.insert_reminder(&Reminder {
        id: new_id(),
        owner_id: owner.to_string(),
        lead_id: None,
        title: "Prepare demo environment".to_string(),
        due_date: now + Duration::days(3),
        priority: 1,
        done: false,
        created_at: now - Duration::days(2),
    })?;

    module.hub().create(
        owner,
        NewNotification {
            title: "Welcome to Lariat".to_string(),
            message: "Demo data has been loaded".to_string(),
            kind: NotificationKind::System,
            related_id: None,
            related_type: None,
        },
        now,
    )?;

    info!(owner, "demo data seeded");
    Ok(())
}
