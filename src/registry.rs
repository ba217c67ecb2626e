//! Pending-invocation registry: correlation identifiers and stored callbacks.
//!
//! The only channel back from an isolated context is an untyped, globally
//! delivered message, so every invocation parks its callbacks here under the
//! identifier embedded in its composed document. The registry is a single
//! process-wide component with an explicit surface (`allocate` plus the
//! three `resolve_*` operations); the underlying maps are never exposed.
//!
//! Resolution for an unknown or already-resolved identifier is a silent
//! no-op: late and duplicate messages are dropped rather than treated as
//! protocol violations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

/// Zero-argument callback fired when pagination completes.
pub type CompletionFn = Box<dyn FnOnce() + Send>;

/// Callback fired with the artifact reference when conversion succeeds.
pub type PdfReadyFn = Box<dyn FnOnce(String) + Send>;

/// Callback fired with the error message when conversion fails.
pub type PdfErrorFn = Box<dyn FnOnce(String) + Send>;

/// Ready/error callback pair for one invocation's conversion result.
///
/// At most one side ever fires; the whole pair is evicted the first time a
/// conversion-result message for its identifier is processed.
#[derive(Default)]
pub struct PdfCallbacks {
    pub on_ready: Option<PdfReadyFn>,
    pub on_error: Option<PdfErrorFn>,
}

pub(crate) struct InstanceRegistry {
    next_id: AtomicU64,
    completion: Mutex<HashMap<u64, CompletionFn>>,
    pdf: Mutex<HashMap<u64, PdfCallbacks>>,
}

impl InstanceRegistry {
    fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            completion: Mutex::new(HashMap::new()),
            pdf: Mutex::new(HashMap::new()),
        }
    }

    /// Mint the next correlation identifier and store any callbacks under it.
    ///
    /// The counter starts at 1 and is incremented unconditionally, so every
    /// invocation gets a distinct identifier for the process lifetime even
    /// when no callbacks were supplied.
    pub(crate) fn allocate(
        &self,
        completion: Option<CompletionFn>,
        pdf: Option<PdfCallbacks>,
    ) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(cb) = completion {
            if let Ok(mut map) = self.completion.lock() {
                map.insert(id, cb);
            }
        }
        if let Some(pair) = pdf {
            if let Ok(mut map) = self.pdf.lock() {
                map.insert(id, pair);
            }
        }
        id
    }

    /// Invoke the completion callback for `id` if one is stored, deleting
    /// the completion entry either way. The PDF pair is left untouched; it
    /// is evicted separately when the conversion result arrives.
    pub(crate) fn resolve_completion(&self, id: u64) {
        let cb = match self.completion.lock() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        };
        if let Some(cb) = cb {
            cb();
        }
    }

    /// Deliver a successful conversion result, evicting the whole pair.
    pub(crate) fn resolve_pdf_ready(&self, id: u64, blob_url: String) {
        let pair = match self.pdf.lock() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        };
        if let Some(pair) = pair {
            if let Some(cb) = pair.on_ready {
                cb(blob_url);
            }
        }
    }

    /// Deliver a conversion failure, evicting the whole pair.
    pub(crate) fn resolve_pdf_error(&self, id: u64, message: String) {
        let pair = match self.pdf.lock() {
            Ok(mut map) => map.remove(&id),
            Err(_) => None,
        };
        if let Some(pair) = pair {
            if let Some(cb) = pair.on_error {
                cb(message);
            }
        }
    }
}

/// The process-wide registry instance. Created on first use and alive for
/// the rest of the process; entries for abandoned contexts are never
/// reclaimed (no timeout eviction exists).
pub(crate) fn registry() -> &'static InstanceRegistry {
    static REGISTRY: OnceLock<InstanceRegistry> = OnceLock::new();
    REGISTRY.get_or_init(InstanceRegistry::new)
}
