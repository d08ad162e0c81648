use async_trait::async_trait;

use crate::{
    messaging::types::{Document, Notice, Outbox},
    Result,
};

/// Reply channel bound to a single incoming request.
///
/// Telegram is the first implementation; the core never sees the platform
/// message object, only this port.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notice: &Notice) -> Result<()>;

    async fn send_document(&self, document: &Document) -> Result<()>;
}

/// Deliver everything queued in `outbox`, in order. Stops at the first failure.
pub async fn deliver(sink: &dyn NotificationSink, outbox: Outbox) -> Result<()> {
    for notice in &outbox.notices {
        sink.notify(notice).await?;
    }
    for doc in &outbox.documents {
        sink.send_document(doc).await?;
    }
    Ok(())
}
