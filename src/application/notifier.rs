//! Notification boundary
//!
//! Change events are handed to a `ChangeSink` in batches of at most ten,
//! the delivery unit the target chat platform accepts per message. The
//! actual chat delivery lives outside this crate; `LogSink` renders events
//! through the logging pipeline and serves as the default sink.

use async_trait::async_trait;
use tracing::info;

use crate::domain::diff::ChangeEvent;

/// Maximum events per delivery call.
pub const DELIVERY_CHUNK: usize = 10;

/// Consumer of change events.
#[async_trait]
pub trait ChangeSink: Send + Sync {
    /// Deliver one batch of at most [`DELIVERY_CHUNK`] events.
    async fn deliver(&self, events: &[ChangeEvent]) -> anyhow::Result<()>;
}

/// Deliver all events in chunks of [`DELIVERY_CHUNK`].
pub async fn deliver_chunked(sink: &dyn ChangeSink, events: &[ChangeEvent]) -> anyhow::Result<()> {
    for chunk in events.chunks(DELIVERY_CHUNK) {
        sink.deliver(chunk).await?;
    }
    Ok(())
}

/// Render one event as display lines: changed fields as `before -> after`,
/// unchanged fields as plain context.
pub fn format_event(event: &ChangeEvent) -> String {
    let mut lines = vec![format!("[{}] {}", event.vendor_label, event.url)];

    for field in &event.fields {
        let label = field.label.as_deref().unwrap_or(field.key);

        if field.changed {
            lines.push(format!(
                "  {label}: {} -> {}",
                field.render_before(),
                field.render_after()
            ));
        } else {
            lines.push(format!("  {label}: {}", field.render_after()));
        }
    }

    lines.join("\n")
}

/// Sink that writes rendered events to the log.
pub struct LogSink;

#[async_trait]
impl ChangeSink for LogSink {
    async fn deliver(&self, events: &[ChangeEvent]) -> anyhow::Result<()> {
        for event in events {
            info!("상품 정보 변경됨\n{}", format_event(event));
        }
        Ok(())
    }
}
