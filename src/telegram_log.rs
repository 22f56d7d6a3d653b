//! Tracing layer that mirrors log lines into an admin chat.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::bot::telegram::{MessageSender, send_long};

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED: usize = 50;
const SENDER_TARGET: &str = concat!(env!("CARGO_CRATE_NAME"), "::bot::telegram");

enum LogMessage {
    /// WARN/ERROR, sent right away.
    Urgent(String),
    /// INFO, batched.
    Info(String),
}

pub struct ChatLogLayer {
    tx: mpsc::UnboundedSender<LogMessage>,
}

impl ChatLogLayer {
    /// Spawns the forwarding task; must be called inside a tokio runtime.
    pub fn new(sender: Arc<dyn MessageSender>, chat_id: i64) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogMessage>();

        tokio::spawn(async move {
            let mut info_buffer: Vec<String> = Vec::new();
            // First flush one interval from now, not immediately.
            let mut interval =
                tokio::time::interval_at(Instant::now() + FLUSH_INTERVAL, FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    msg = rx.recv() => {
                        match msg {
                            Some(LogMessage::Urgent(text)) => {
                                forward(sender.as_ref(), chat_id, &text).await;
                            }
                            Some(LogMessage::Info(text)) => {
                                info_buffer.push(text);
                                if info_buffer.len() >= MAX_BUFFERED {
                                    flush_buffer(sender.as_ref(), chat_id, &mut info_buffer).await;
                                }
                            }
                            None => {
                                flush_buffer(sender.as_ref(), chat_id, &mut info_buffer).await;
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        flush_buffer(sender.as_ref(), chat_id, &mut info_buffer).await;
                    }
                }
            }
        });

        Self { tx }
    }
}

async fn forward(sender: &dyn MessageSender, chat_id: i64, text: &str) {
    // Not logged through tracing: that would feed back into this layer.
    if let Err(e) = send_long(sender, chat_id, text).await {
        eprintln!("Failed to forward log line: {e}");
    }
}

async fn flush_buffer(sender: &dyn MessageSender, chat_id: i64, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    forward(sender, chat_id, &combined).await;
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message.push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

impl<S: Subscriber> Layer<S> for ChatLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }
        // Library chatter and the sender's own failures would loop back here.
        let target = event.metadata().target();
        if !target.starts_with(env!("CARGO_CRATE_NAME")) || target.starts_with(SENDER_TARGET) {
            return;
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        let msg = match level {
            Level::ERROR | Level::WARN => LogMessage::Urgent(visitor.message),
            _ => LogMessage::Info(visitor.message),
        };

        if self.tx.send(msg).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::testing::RecordingSender;
    use tracing_subscriber::prelude::*;

    #[tokio::test(start_paused = true)]
    async fn test_warn_is_forwarded_and_info_is_batched() {
        let sender = Arc::new(RecordingSender::new());
        let layer = ChatLogLayer::new(sender.clone(), 77);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("first");
            tracing::info!("second");
            tracing::warn!("careful");
            tracing::debug!("ignored");
        });

        tokio::time::sleep(FLUSH_INTERVAL * 2).await;

        let sent = sender.sent_to(77);
        assert!(sent.contains(&"careful".to_string()));
        assert!(sent.contains(&"first\nsecond".to_string()));
        assert!(!sent.iter().any(|s| s.contains("ignored")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_info_lines_wait_for_the_interval() {
        let sender = Arc::new(RecordingSender::new());
        let layer = ChatLogLayer::new(sender.clone(), 77);
        let dispatch = tracing::Dispatch::new(tracing_subscriber::registry().with(layer));

        for line in ["one", "two", "three"] {
            tracing::dispatcher::with_default(&dispatch, || tracing::info!("{line}"));
            tokio::task::yield_now().await;
        }
        assert!(sender.sent().is_empty());

        tokio::time::sleep(FLUSH_INTERVAL + Duration::from_millis(10)).await;
        assert_eq!(sender.sent_to(77), vec!["one\ntwo\nthree".to_string()]);
    }
}
