//! Inbound ports. Adapters call into the application.

use crate::domain::{DomainError, InboundEvent};

/// Input port: operator console invokes application use cases.
#[async_trait::async_trait]
pub trait InputPort: Send + Sync {
    /// Handle login / 2FA flow. Returns when authenticated.
    async fn run_auth(&self) -> Result<(), DomainError>;

    /// Main menu loop. Returns when the operator exits.
    async fn run(&self) -> Result<(), DomainError>;
}

/// Receives private-chat updates from the transport. One call per message.
#[async_trait::async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: InboundEvent);
}
