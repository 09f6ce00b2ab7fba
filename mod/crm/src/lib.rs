pub mod analytics;
pub mod api;
pub mod model;
pub mod notify;
pub mod store;

use std::sync::Arc;

use axum::Router;
use lariat_core::{Module, ServiceError};
use lariat_sql::SQLStore;

use analytics::Analytics;
use notify::{ConnectionRegistry, NotificationHub};
use store::SqlRecordStore;

/// Authenticated owner of the current request, injected as a request
/// extension by the server's auth layer. Every query in this module is
/// scoped to it.
#[derive(Debug, Clone)]
pub struct OwnerId(pub String);

/// Shared per-module state handed to the route handlers.
pub struct CrmState {
    pub analytics: Analytics,
    pub hub: NotificationHub,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<SqlRecordStore>,
}

/// The CRM module — analytics aggregation and the notification hub.
///
/// Embed this in a business service to get dashboard metrics, activity
/// timelines, historical series, recommendations, priority tasks, the
/// composite overview, and durable notifications with live push.
pub struct CrmModule {
    state: Arc<CrmState>,
}

impl CrmModule {
    /// Create the module and initialise its storage schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ServiceError> {
        let store = Arc::new(SqlRecordStore::new(db)?);
        let registry = Arc::new(ConnectionRegistry::new());
        let analytics =
            Analytics::with_default_suggestions(store.clone() as Arc<dyn store::RecordStore>);
        let hub = NotificationHub::new(
            store.clone() as Arc<dyn store::RecordStore>,
            registry.clone(),
        );
        Ok(Self {
            state: Arc::new(CrmState {
                analytics,
                hub,
                registry,
                store,
            }),
        })
    }

    /// Direct store access for bootstrap and seeding.
    pub fn store(&self) -> &Arc<SqlRecordStore> {
        &self.state.store
    }

    pub fn hub(&self) -> &NotificationHub {
        &self.state.hub
    }
}

impl Module for CrmModule {
    fn name(&self) -> &str {
        "crm"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.state))
    }
}
