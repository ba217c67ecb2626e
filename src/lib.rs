//! Paperframe
//!
//! Renders caller-supplied HTML as a paginated document inside an isolated
//! rendering context and converts the result into a binary PDF artifact,
//! reporting completion, success, or failure back to the caller across an
//! asynchronous message boundary.
//!
//! # How it works
//!
//! - Each invocation is assigned a process-unique **correlation
//!   identifier** and its callbacks are parked in a registry.
//! - A self-contained executable document is composed from the caller's
//!   fragments, with the identifier embedded in its bootstrap script.
//! - The document is mounted into an **isolated context** (filling a
//!   resolved target node, or parked off-screen), where it paginates and
//!   converts independently of the host.
//! - The context posts correlated messages outward; a single process-wide
//!   listener matches them back to the pending invocation and fires the
//!   stored callbacks.
//!
//! There is no cancellation: once mounted, a context cannot be stopped
//! from the host side, and a context that disappears before reporting
//! leaves its invocation permanently unresolved.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use paperframe::headless::{HeadlessHost, ScriptedServices};
//! use paperframe::{PdfRenderer, RenderOptions};
//!
//! # #[tokio::main(flavor = "multi_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = HeadlessHost::new(
//!     "<html><body><div id=\"report\"></div></body></html>",
//!     Arc::new(ScriptedServices::default()),
//! );
//! let renderer = PdfRenderer::new(host);
//!
//! let artifact = renderer
//!     .generate_pdf(&RenderOptions {
//!         body_html: "<h1>Quarterly report</h1>".to_string(),
//!         ..Default::default()
//!     })
//!     .await?;
//! assert!(!artifact.is_empty());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, Mutex};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::error;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::oneshot;

pub mod error;
pub use error::{Error, Result};

mod compose;
mod context;
pub mod engine;
pub mod host;
mod protocol;
mod registry;

// In-process host backend with scripted engines
#[cfg(feature = "headless")]
pub mod headless;

pub use context::drive_context;
pub use engine::{
    ContextServices, Conversion, ConversionEngine, ConvertOptions, PagedOutput, PaginationEngine,
    Preview,
};
pub use host::{BlobStore, ContextId, FramePlacement, HostEnvironment, OFFSCREEN_OFFSET_PX};
pub use registry::{CompletionFn, PdfCallbacks, PdfErrorFn, PdfReadyFn};

use registry::registry;

/// Page size token understood by the layout rule block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageSize {
    #[default]
    A4,
    Letter,
    Legal,
}

impl PageSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSize::A4 => "a4",
            PageSize::Letter => "letter",
            PageSize::Legal => "legal",
        }
    }
}

/// Parameters for one render invocation.
///
/// Every field has an independent default, so callers set only what they
/// need via struct-update syntax against `Default::default()`. Options
/// are immutable for the duration of an invocation: nothing is re-read
/// after the executable document has been composed.
///
/// Content fragments are opaque markup, inserted verbatim. The core
/// performs no sanitization or validation, so malformed input yields a
/// malformed document. Callers are trusted.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Main document fragment.
    pub body_html: String,
    /// Repeating page-header fragment.
    pub header_html: String,
    /// Page-footer fragment; placement depends on
    /// `footer_on_last_page_only`.
    pub footer_html: String,
    /// Extra content for the document head (styles, meta tags, fonts).
    pub head_html: String,
    /// Page size token for the layout rule block.
    pub page_size: PageSize,
    /// Left page margin, millimeters.
    pub margin_left: f32,
    /// Right page margin, millimeters.
    pub margin_right: f32,
    /// Height reserved for the repeating header region, millimeters.
    pub header_height: f32,
    /// Height reserved for the footer region, millimeters.
    pub footer_height: f32,
    /// Extra padding above the body content, millimeters.
    pub top_padding: f32,
    /// `false`: the footer repeats on every page. `true`: the footer is
    /// placed once after the body so it lands on the last page only.
    pub footer_on_last_page_only: bool,
    /// Selector that receives the page-number rule. Empty disables
    /// numbering.
    pub page_number_selector: String,
    /// Where to attach the isolated context. `None` mounts off-screen.
    pub container_selector: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            body_html: String::new(),
            header_html: String::new(),
            footer_html: String::new(),
            head_html: String::new(),
            page_size: PageSize::A4,
            margin_left: 10.0,
            margin_right: 10.0,
            header_height: 15.0,
            footer_height: 15.0,
            top_padding: 0.0,
            footer_on_last_page_only: false,
            page_number_selector: String::new(),
            container_selector: None,
        }
    }
}

impl RenderOptions {
    /// The subset of options the conversion engine consumes, embedded
    /// into the composed document's bootstrap script.
    pub(crate) fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            page_size: self.page_size,
            margin_left: self.margin_left,
            margin_right: self.margin_right,
            header_height: self.header_height,
            footer_height: self.footer_height,
        }
    }
}

/// Callbacks observing one invocation's progress. All optional; each
/// fires at most once.
#[derive(Default)]
pub struct RenderHooks {
    /// Fired when pagination completes inside the isolated context.
    pub on_complete: Option<CompletionFn>,
    /// Ready/error pair for the conversion result.
    pub pdf: Option<PdfCallbacks>,
}

impl RenderHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe pagination completion.
    pub fn completion(mut self, cb: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(cb));
        self
    }

    /// Observe a successful conversion (receives the artifact reference).
    pub fn pdf_ready(mut self, cb: impl FnOnce(String) + Send + 'static) -> Self {
        self.pdf.get_or_insert_with(PdfCallbacks::default).on_ready = Some(Box::new(cb));
        self
    }

    /// Observe a failed conversion (receives the error message).
    pub fn pdf_error(mut self, cb: impl FnOnce(String) + Send + 'static) -> Self {
        self.pdf.get_or_insert_with(PdfCallbacks::default).on_error = Some(Box::new(cb));
        self
    }
}

/// Binary output document handed to callers by the direct-conversion
/// facade. Owns its bytes; the context-scoped reference it came from has
/// already been consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    bytes: Vec<u8>,
}

impl Artifact {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Hex SHA-256 of the artifact bytes, for golden assertions.
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }

    /// Encode the artifact as a `data:` URL suitable for download links.
    pub fn to_data_url(&self) -> String {
        format!("data:application/pdf;base64,{}", BASE64.encode(&self.bytes))
    }
}

/// Entry point for the render pipeline.
///
/// Holds the host environment and drives the four stages: allocate a
/// correlation identifier, compose the executable document, mount it in
/// an isolated context, and let the process-wide protocol listener
/// resolve the stored callbacks when the context reports back.
pub struct PdfRenderer {
    host: Arc<dyn HostEnvironment>,
}

impl PdfRenderer {
    pub fn new(host: Arc<dyn HostEnvironment>) -> Self {
        Self { host }
    }

    /// Render with no observers: fire-and-forget.
    pub async fn render(&self, options: &RenderOptions) {
        self.render_with(options, RenderHooks::default()).await
    }

    /// Render and observe progress through `hooks`.
    ///
    /// Never fails past this boundary: internal failures are logged at
    /// error level and routed to the error callback when one is present.
    /// Returns once the isolated context has been mounted; pagination and
    /// conversion proceed independently afterwards.
    pub async fn render_with(&self, options: &RenderOptions, hooks: RenderHooks) {
        let iter = registry().allocate(hooks.on_complete, hooks.pdf);
        let source = compose::compose(iter, options);
        if let Err(err) = host::mount(
            self.host.as_ref(),
            source,
            options.container_selector.as_deref(),
        ) {
            error!(
                "failed to mount isolated context for invocation {}: {}",
                iter, err
            );
            registry().resolve_pdf_error(iter, err.to_string());
        }
    }

    /// Drive the full pipeline and return the binary artifact directly.
    ///
    /// Fails immediately with [`Error::Unsupported`] when the host cannot
    /// create isolated contexts, without mounting anything. On success the
    /// artifact reference is dereferenced into owned bytes before this
    /// future resolves, so callers never see a context-scoped reference.
    pub async fn generate_pdf(&self, options: &RenderOptions) -> Result<Artifact> {
        if !self.host.supports_isolated_contexts() {
            return Err(Error::Unsupported(
                "host reports no isolated-context support".to_string(),
            ));
        }

        let (tx, rx) = oneshot::channel::<Result<Artifact>>();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let host = self.host.clone();
        let ready_tx = tx.clone();
        let error_tx = tx;

        let hooks = RenderHooks::new()
            .pdf_ready(move |blob_url| {
                let result = host.take_blob(&blob_url).map(Artifact::new).ok_or_else(|| {
                    Error::ProtocolError(format!(
                        "artifact reference {} did not dereference",
                        blob_url
                    ))
                });
                if let Ok(mut slot) = ready_tx.lock() {
                    if let Some(tx) = slot.take() {
                        let _ = tx.send(result);
                    }
                }
            })
            .pdf_error(move |message| {
                if let Ok(mut slot) = error_tx.lock() {
                    if let Some(tx) = slot.take() {
                        let _ = tx.send(Err(Error::ConversionError(message)));
                    }
                }
            });

        self.render_with(options, hooks).await;

        rx.await
            .map_err(|e| Error::ProtocolError(format!("render resolution canceled: {}", e)))?
    }
}
