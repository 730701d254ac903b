//! CloudWatch Logs sink.
//!
//! Forwards the same JSON lines (signed or not) via PutLogEvents. The
//! sequence token lives under the writer's mutex, which is held across the
//! call so at most one put is in flight per writer.

use std::future::Future;
use std::pin::Pin;

use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use tokio::sync::Mutex;

use crate::entries::AuditEntry;
use crate::signing::Signer;
use crate::writer::{encode_line, AuditWriter};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub struct CloudWatchWriter {
    client: Client,
    log_group: String,
    log_stream: String,
    signer: Option<Signer>,
    sequence_token: Mutex<Option<String>>,
}

impl CloudWatchWriter {
    pub fn new(
        client: Client,
        log_group: impl Into<String>,
        log_stream: impl Into<String>,
    ) -> Self {
        Self {
            client,
            log_group: log_group.into(),
            log_stream: log_stream.into(),
            signer: None,
            sequence_token: Mutex::new(None),
        }
    }

    pub fn from_config(
        config: &aws_config::SdkConfig,
        log_group: impl Into<String>,
        log_stream: impl Into<String>,
    ) -> Self {
        Self::new(Client::new(config), log_group, log_stream)
    }

    pub fn with_signer(mut self, signer: Signer) -> Self {
        self.signer = Some(signer);
        self
    }

    async fn put_line(&self, line: String) {
        let event = match InputLogEvent::builder()
            .timestamp(jiff::Timestamp::now().as_millisecond())
            .message(line)
            .build()
        {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed CloudWatch log event");
                return;
            }
        };

        let mut token = self.sequence_token.lock().await;

        let mut req = self
            .client
            .put_log_events()
            .log_group_name(&self.log_group)
            .log_stream_name(&self.log_stream)
            .log_events(event);
        if let Some(t) = token.as_ref() {
            req = req.sequence_token(t);
        }

        match req.send().await {
            Ok(resp) => {
                *token = resp.next_sequence_token().map(String::from);
            }
            Err(e) => {
                // Token may be stale; reset so the next put renegotiates.
                *token = None;
                tracing::warn!(
                    log_group = %self.log_group,
                    log_stream = %self.log_stream,
                    error = %e.into_service_error(),
                    "PutLogEvents failed"
                );
            }
        }
    }
}

impl AuditWriter for CloudWatchWriter {
    fn log(&self, entry: AuditEntry) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(line) = encode_line(self.signer.as_ref(), &entry) {
                self.put_line(line).await;
            }
        })
    }
}
