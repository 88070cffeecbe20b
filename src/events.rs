//! Outbound stream events and the channel that carries them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One event on the voice stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Response text, in generation order.
    #[serde(rename_all = "camelCase")]
    Text { chunk_id: u32, text: String },

    /// A synthesized clip is ready to fetch by `audio_id`.
    #[serde(rename = "audio", rename_all = "camelCase")]
    AudioReference {
        chunk_id: u32,
        audio_id: String,
        text: String,
    },

    /// Terminal success.
    #[serde(rename = "complete", rename_all = "camelCase")]
    Completion {
        full_response: String,
        transcript: String,
    },

    /// Failure. Scoped to one chunk when `chunk_id` is set, otherwise terminal.
    #[serde(rename_all = "camelCase")]
    Error {
        error: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk_id: Option<u32>,
    },
}

impl StreamEvent {
    pub fn text(chunk_id: u32, text: impl Into<String>) -> Self {
        Self::Text {
            chunk_id,
            text: text.into(),
        }
    }

    pub fn chunk_error(chunk_id: u32, error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            chunk_id: Some(chunk_id),
        }
    }

    pub fn stream_error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
            chunk_id: None,
        }
    }

    /// Whether this event ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completion { .. } | Self::Error { chunk_id: None, .. }
        )
    }

    /// Wire framing: `data: <json>\n\n`.
    pub fn to_frame(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","error":"failed to encode event: {e}"}}"#)
        });
        format!("data: {json}\n\n")
    }
}

/// Parse a framed body back into events (used by clients and tests).
pub fn parse_frames(body: &str) -> Result<Vec<StreamEvent>, serde_json::Error> {
    body.split("\n\n")
        .filter_map(|frame| frame.trim().strip_prefix("data:"))
        .map(|json| serde_json::from_str(json.trim()))
        .collect()
}

/// Write side of one request's event stream.
///
/// Clones share the same channel. Non-terminal events go through
/// [`emit`](Self::emit); exactly one terminal event goes through
/// [`finish`](Self::finish), after which every send is refused.
#[derive(Clone, Debug)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    terminated: Arc<AtomicBool>,
}

/// Read side of an [`EventSink`]. Ends once every sink clone is dropped.
pub type EventStream = UnboundedReceiverStream<StreamEvent>;

impl EventSink {
    pub fn channel() -> (Self, EventStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            terminated: Arc::new(AtomicBool::new(false)),
        };
        (sink, UnboundedReceiverStream::new(rx))
    }

    /// Send a non-terminal event. Returns `false` if it was not delivered.
    pub fn emit(&self, event: StreamEvent) -> bool {
        if event.is_terminal() {
            tracing::warn!("Terminal event sent through emit; use finish");
            return false;
        }
        if self.is_closed() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    /// Send the terminal event. Only the first call has any effect.
    pub fn finish(&self, event: StreamEvent) -> bool {
        debug_assert!(event.is_terminal());
        if self
            .terminated
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }

    /// Terminated, or the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.is_terminated() || self.tx.is_closed()
    }
}
