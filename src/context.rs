//! Isolated-context driver: the executable side of a composed document.
//!
//! A context knows nothing about the invocation that spawned it beyond
//! what its own document says; the correlation identifier and conversion
//! options are read back out of the bootstrap script. The pipeline then
//! runs fonts → pagination → conversion, posting the completion signal
//! before any conversion signal and exactly one of `PDF_READY` /
//! `PDF_ERROR` at the end, never both.

use std::sync::Arc;

use log::{debug, error};

use crate::compose::{CONF_MARKER, ITER_MARKER};
use crate::engine::{ContextServices, Conversion, ConvertOptions};
use crate::host::BlobStore;
use crate::protocol::{self, MessagePort, WireMessage};
use crate::{Error, Result};

/// Run the isolated-context pipeline for a composed document, blocking the
/// calling thread until the context has posted its messages.
///
/// Host implementations call this from whatever execution vehicle backs
/// their contexts; the headless host spawns one detached thread per
/// context. Once running, the pipeline cannot be stopped from outside.
pub fn drive_context(
    source: String,
    services: Arc<dyn ContextServices>,
    blobs: Arc<dyn BlobStore>,
) {
    run(source, protocol::port(), services, blobs)
}

/// Pipeline entry point. Never panics outward; every failure is converted
/// into a single `PDF_ERROR` message for the embedded identifier.
pub(crate) fn run(
    source: String,
    port: MessagePort,
    services: Arc<dyn ContextServices>,
    blobs: Arc<dyn BlobStore>,
) {
    let iter = match embedded_id(&source) {
        Some(iter) => iter,
        None => {
            // Without an identifier there is nothing to correlate a
            // message to; the context stays inert.
            error!("composed document carries no correlation identifier");
            return;
        }
    };

    if let Err(err) = execute(&source, iter, &port, services.as_ref(), blobs.as_ref()) {
        error!("render pipeline failed for invocation {}: {}", iter, err);
        port.post(&WireMessage::PdfError {
            iter,
            error: err.to_string(),
        });
    }
}

fn execute(
    source: &str,
    iter: u64,
    port: &MessagePort,
    services: &dyn ContextServices,
    blobs: &dyn BlobStore,
) -> Result<()> {
    services.wait_fonts()?;

    let mut paginator = services.paginator();
    let preview = paginator.preview(source)?;

    // Completion signal: always posted before any conversion signal.
    port.post(&WireMessage::RenderComplete {
        iter,
        page_total: preview.total,
    });

    let options = embedded_options(source)?;
    let mut converter = services.converter();
    let mut output = Conversion::new(converter.as_mut())
        .content(source)
        .options(options)
        .run()?;

    // The conversion engine may overshoot the paginated total; trailing
    // pages beyond it are dropped so both counts agree exactly.
    if preview.total > 0 {
        while output.page_count() > preview.total {
            output.delete_page(output.page_count())?;
        }
    }

    let bytes = output.into_bytes()?;
    debug!("invocation {} produced {} artifact bytes", iter, bytes.len());
    let blob_url = blobs.store(bytes);
    port.post(&WireMessage::PdfReady { iter, blob_url });
    Ok(())
}

/// Read the correlation identifier back out of the bootstrap script.
pub(crate) fn embedded_id(source: &str) -> Option<u64> {
    let rest = &source[source.find(ITER_MARKER)? + ITER_MARKER.len()..];
    let end = rest.find(';')?;
    rest[..end].trim().parse().ok()
}

/// Read the conversion-options literal back out of the bootstrap script.
fn embedded_options(source: &str) -> Result<ConvertOptions> {
    let start = source.find(CONF_MARKER).ok_or_else(|| {
        Error::ProtocolError("composed document carries no conversion options".to_string())
    })?;
    let rest = &source[start + CONF_MARKER.len()..];
    let end = rest.find(";\n").ok_or_else(|| {
        Error::ProtocolError("unterminated conversion-options literal".to_string())
    })?;
    serde_json::from_str(&rest[..end])
        .map_err(|e| Error::ProtocolError(format!("malformed conversion options: {}", e)))
}
