use async_trait::async_trait;

use crate::Result;

/// Outbound half of the chat transport.
///
/// The dispatcher and every scheduled task call into the same port
/// concurrently, so implementations must serialize writes internally.
#[async_trait]
pub trait OutboundPort: Send + Sync {
    /// Announce the bot on `mountpoint`. Sent once per connection.
    async fn join_channel(&self, mountpoint: &str, auth_token: &str) -> Result<()>;

    /// Post a plain text message to the channel.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Transport-level ping that keeps the session open.
    async fn keep_alive(&self) -> Result<()>;
}
