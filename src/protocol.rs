//! Cross-context wire protocol and the process-wide message listener.
//!
//! An isolated context has no call-stack return path into the host; the
//! only way back is an asynchronous message carrying its correlation
//! identifier. One listener is attached on first use and shared by every
//! concurrent invocation for the rest of the process. Messages travel as
//! JSON value snapshots (copy semantics, never live references) and are
//! processed synchronously in arrival order; shapes other than the three
//! recognized discriminants are dropped without error, which keeps the
//! listener robust against duplicate, late, or unrelated traffic.

use std::sync::mpsc::{self, Sender};
use std::sync::OnceLock;
use std::thread;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::registry::registry;

/// Messages an isolated context may post outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub(crate) enum WireMessage {
    /// Pagination finished for invocation `iter`.
    #[serde(rename = "renderpdf")]
    RenderComplete {
        iter: u64,
        #[serde(rename = "pageTotal")]
        page_total: u32,
    },

    /// Binary artifact available, referenced by `blobUrl`.
    #[serde(rename = "PDF_READY")]
    PdfReady {
        iter: u64,
        #[serde(rename = "blobUrl")]
        blob_url: String,
    },

    /// Conversion failed for invocation `iter`, with message text.
    #[serde(rename = "PDF_ERROR")]
    PdfError { iter: u64, error: String },
}

/// Sending half of the cross-context channel, cloned into each context.
#[derive(Clone)]
pub(crate) struct MessagePort {
    tx: Sender<Value>,
}

impl MessagePort {
    /// Post a message outward. The payload is snapshotted to a JSON value
    /// before it crosses the boundary; the receiving side never observes
    /// context-local state.
    pub(crate) fn post(&self, msg: &WireMessage) {
        match serde_json::to_value(msg) {
            Ok(value) => {
                let _ = self.tx.send(value);
            }
            Err(err) => debug!("dropping unserializable message: {}", err),
        }
    }

    /// Post a raw JSON value, recognized or not. The listener ignores
    /// shapes it does not know.
    #[cfg(test)]
    pub(crate) fn post_raw(&self, value: Value) {
        let _ = self.tx.send(value);
    }

    /// A port wired to a private receiver instead of the process listener,
    /// for driving the context pipeline in isolation.
    #[cfg(test)]
    pub(crate) fn loopback() -> (Self, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, rx)
    }
}

/// Return a port onto the process-wide listener, attaching the listener on
/// the first call. The listener thread drains messages for the remainder
/// of the process lifetime; it is never detached or re-created.
pub(crate) fn port() -> MessagePort {
    static LISTENER: OnceLock<MessagePort> = OnceLock::new();
    LISTENER
        .get_or_init(|| {
            let (tx, rx) = mpsc::channel::<Value>();
            thread::spawn(move || {
                while let Ok(value) = rx.recv() {
                    dispatch(value);
                }
            });
            MessagePort { tx }
        })
        .clone()
}

/// Route one received message to the registry by its discriminant.
fn dispatch(value: Value) {
    match serde_json::from_value::<WireMessage>(value) {
        Ok(WireMessage::RenderComplete { iter, page_total }) => {
            debug!(
                "pagination complete for invocation {} ({} pages)",
                iter, page_total
            );
            registry().resolve_completion(iter);
        }
        Ok(WireMessage::PdfReady { iter, blob_url }) => {
            registry().resolve_pdf_ready(iter, blob_url);
        }
        Ok(WireMessage::PdfError { iter, error }) => {
            registry().resolve_pdf_error(iter, error);
        }
        // Unknown shape or unrelated origin; drop it.
        Err(_) => {}
    }
}
