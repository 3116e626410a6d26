use std::sync::Arc;

use anyhow::Context;

pub mod config;
pub mod session;
pub mod sync_client;
pub mod tenancy;

pub use config::{load_settings, Settings};
pub use session::{
    Completion, MessageKind, SessionController, SessionEvent, SessionMessage, SessionPhase,
    SessionSnapshot,
};
pub use sync_client::{HttpOrderService, OrderService};
pub use tenancy::{TenantId, TenantMembership, TenantTable, TenantView};

/// Builds a session wired to the HTTP order service described by `settings`.
pub fn session_from_settings(settings: &Settings) -> anyhow::Result<SessionController> {
    let service = HttpOrderService::new(settings.service_url.clone(), settings.request_timeout)
        .context("failed to create order service client")?;
    let tenants = settings.tenant_table()?;
    Ok(SessionController::new(Arc::new(service), tenants))
}
