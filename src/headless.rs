//! In-process host backend with scripted engines.
//!
//! `HeadlessHost` implements the host-environment surface without a real
//! browser: the host page is a plain markup string, mount selectors
//! resolve against it with `scraper`, and each isolated context runs on
//! its own detached thread. The engines are deliberately scripted
//! (reported totals, produced page counts, and failures are all
//! configurable), which keeps end-to-end behavior deterministic for tests
//! and benches, and gives embedders a working backend until they wire up
//! real engines.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use scraper::{Html, Selector};
use sha2::{Digest, Sha256};

use crate::context;
use crate::engine::{
    ContextServices, ConversionEngine, ConvertOptions, PagedOutput, PaginationEngine, Preview,
};
use crate::host::{BlobStore, ContextId, FramePlacement, HostEnvironment, OFFSCREEN_OFFSET_PX};
use crate::{Error, Result};

/// Record of one mounted frame, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameRecord {
    pub context: ContextId,
    /// Resolved parent node, or `None` for the document root.
    pub parent: Option<String>,
    /// Sizing relative to the parent, percent. Filled frames are 100/100.
    pub width_pct: u32,
    pub height_pct: u32,
    pub border_px: u32,
    /// Fixed offset applied to off-screen frames.
    pub offset_px: Option<i32>,
}

/// Content-addressed in-memory blob store shared between a host and the
/// contexts it spawns.
struct InMemoryBlobs {
    entries: Mutex<HashMap<String, Vec<u8>>>,
    seq: AtomicU64,
}

impl InMemoryBlobs {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(0),
        })
    }

    fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl BlobStore for InMemoryBlobs {
    fn store(&self, bytes: Vec<u8>) -> String {
        let digest = Sha256::digest(&bytes);
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let url = format!("blob:paperframe/{}-{}", hex::encode(&digest[..8]), seq);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(url.clone(), bytes);
        }
        url
    }

    fn take(&self, blob_url: &str) -> Option<Vec<u8>> {
        match self.entries.lock() {
            Ok(mut entries) => entries.remove(blob_url),
            Err(_) => None,
        }
    }
}

/// An in-process host environment.
pub struct HeadlessHost {
    page_html: String,
    services: Arc<dyn ContextServices>,
    frames: Mutex<Vec<FrameRecord>>,
    next_context: AtomicU64,
    blobs: Arc<InMemoryBlobs>,
    capable: bool,
}

impl HeadlessHost {
    /// Create a host whose page is `page_html` and whose contexts draw
    /// their engines from `services`.
    pub fn new(page_html: impl Into<String>, services: Arc<dyn ContextServices>) -> Arc<Self> {
        Self::with_capability(page_html.into(), services, true)
    }

    /// A host that reports no isolated-context capability: mounting fails
    /// and the direct-conversion facade refuses before mounting anything.
    pub fn incapable() -> Arc<Self> {
        Self::with_capability(String::new(), Arc::new(ScriptedServices::default()), false)
    }

    fn with_capability(
        page_html: String,
        services: Arc<dyn ContextServices>,
        capable: bool,
    ) -> Arc<Self> {
        Arc::new(Self {
            page_html,
            services,
            frames: Mutex::new(Vec::new()),
            next_context: AtomicU64::new(1),
            blobs: InMemoryBlobs::new(),
            capable,
        })
    }

    /// Snapshot of every frame mounted so far.
    pub fn frames(&self) -> Vec<FrameRecord> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Number of artifact blobs currently held (stored, not yet taken).
    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

impl HostEnvironment for HeadlessHost {
    fn supports_isolated_contexts(&self) -> bool {
        self.capable
    }

    fn resolve(&self, selector: &str) -> Option<String> {
        let parsed = Selector::parse(selector).ok()?;
        let doc = Html::parse_document(&self.page_html);
        doc.select(&parsed).next().map(|_| selector.to_string())
    }

    fn create_context(&self, placement: FramePlacement, source: String) -> Result<ContextId> {
        if !self.capable {
            return Err(Error::MountError(
                "host cannot create isolated rendering contexts".to_string(),
            ));
        }

        let id = ContextId(self.next_context.fetch_add(1, Ordering::Relaxed));
        let record = match &placement {
            FramePlacement::Fill { target } => FrameRecord {
                context: id,
                parent: Some(target.clone()),
                width_pct: 100,
                height_pct: 100,
                border_px: 0,
                offset_px: None,
            },
            FramePlacement::Offscreen => FrameRecord {
                context: id,
                parent: None,
                width_pct: 100,
                height_pct: 100,
                border_px: 0,
                offset_px: Some(OFFSCREEN_OFFSET_PX),
            },
        };
        if let Ok(mut frames) = self.frames.lock() {
            frames.push(record);
        }

        // Injection is the single assignment of `source` into the new
        // context; from here it runs on its own detached thread and
        // cannot be stopped from the host side.
        let services = self.services.clone();
        let blobs: Arc<dyn BlobStore> = self.blobs.clone();
        thread::spawn(move || context::drive_context(source, services, blobs));

        Ok(id)
    }

    fn take_blob(&self, blob_url: &str) -> Option<Vec<u8>> {
        self.blobs.take(blob_url)
    }
}

/// Stage at which a scripted pipeline fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStage {
    Fonts,
    Pagination,
    Conversion,
}

/// Deterministic engine provider.
///
/// `pages` is what the paginator reports; `convert_pages` is what the
/// converter actually produces (overshoot beyond the reported total is
/// trimmed by the context); `fail` injects a failure at one stage.
#[derive(Debug, Clone)]
pub struct ScriptedServices {
    pub pages: u32,
    pub convert_pages: u32,
    pub fail: Option<FailStage>,
    /// Artificial font-readiness delay, for shuffling completion order in
    /// concurrency tests.
    pub font_delay: Duration,
}

impl Default for ScriptedServices {
    fn default() -> Self {
        Self {
            pages: 1,
            convert_pages: 1,
            fail: None,
            font_delay: Duration::ZERO,
        }
    }
}

impl ScriptedServices {
    /// Paginator reports `pages`; converter produces `convert_pages`.
    pub fn with_pages(pages: u32, convert_pages: u32) -> Self {
        Self {
            pages,
            convert_pages,
            ..Default::default()
        }
    }

    /// A pipeline that fails at `stage`.
    pub fn failing_at(stage: FailStage) -> Self {
        Self {
            fail: Some(stage),
            ..Default::default()
        }
    }
}

impl ContextServices for ScriptedServices {
    fn wait_fonts(&self) -> Result<()> {
        if !self.font_delay.is_zero() {
            thread::sleep(self.font_delay);
        }
        if self.fail == Some(FailStage::Fonts) {
            return Err(Error::FontError("scripted font failure".to_string()));
        }
        Ok(())
    }

    fn paginator(&self) -> Box<dyn PaginationEngine> {
        Box::new(ScriptedPaginator {
            total: self.pages,
            fail: self.fail == Some(FailStage::Pagination),
        })
    }

    fn converter(&self) -> Box<dyn ConversionEngine> {
        Box::new(ScriptedConverter {
            pages: self.convert_pages,
            fail: self.fail == Some(FailStage::Conversion),
        })
    }
}

pub struct ScriptedPaginator {
    total: u32,
    fail: bool,
}

impl PaginationEngine for ScriptedPaginator {
    fn preview(&mut self, _document: &str) -> Result<Preview> {
        if self.fail {
            return Err(Error::PaginationError(
                "scripted pagination failure".to_string(),
            ));
        }
        Ok(Preview { total: self.total })
    }
}

pub struct ScriptedConverter {
    pages: u32,
    fail: bool,
}

impl ConversionEngine for ScriptedConverter {
    fn convert(&mut self, content: &str, _options: &ConvertOptions) -> Result<Box<dyn PagedOutput>> {
        if self.fail {
            return Err(Error::ConversionError(
                "scripted conversion failure".to_string(),
            ));
        }
        Ok(Box::new(StubDocument {
            pages: self.pages,
            content_len: content.len(),
        }))
    }
}

/// Page-countable stub output. The final page count is recoverable from
/// the assembled bytes (see [`stub_page_count`]), which is what makes
/// trimming observable end-to-end. Only counts are tracked; deleting any
/// page just shrinks the tally.
pub struct StubDocument {
    pages: u32,
    content_len: usize,
}

impl PagedOutput for StubDocument {
    fn page_count(&self) -> u32 {
        self.pages
    }

    fn delete_page(&mut self, page: u32) -> Result<()> {
        if page == 0 || page > self.pages {
            return Err(Error::ConversionError(format!(
                "no page {} to delete",
                page
            )));
        }
        self.pages -= 1;
        Ok(())
    }

    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>> {
        let mut out = format!("%PDF-stub {} pages\n", self.pages).into_bytes();
        out.extend_from_slice(format!("%content {} bytes\n", self.content_len).as_bytes());
        Ok(out)
    }
}

/// Recover the page count from a stub document produced by
/// [`ScriptedConverter`].
pub fn stub_page_count(bytes: &[u8]) -> Option<u32> {
    let text = std::str::from_utf8(bytes).ok()?;
    let rest = text.strip_prefix("%PDF-stub ")?;
    rest.split_whitespace().next()?.parse().ok()
}
