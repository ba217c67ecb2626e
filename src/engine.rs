//! Adapter interfaces for the two external engines.
//!
//! The pagination engine lays out flowed content into discrete pages and
//! reports the resulting count; the conversion engine rasterizes a document
//! into a binary, page-countable output. Both are consumed through
//! statically known traits wired in by the host environment; there is no
//! runtime probing of engine entry points.

use serde::{Deserialize, Serialize};

use crate::{PageSize, Result};

/// Pagination result: the number of pages the engine laid out.
#[derive(Debug, Clone, Copy)]
pub struct Preview {
    pub total: u32,
}

/// External pagination engine boundary.
pub trait PaginationEngine: Send {
    /// Lay out the document and report the resulting page count.
    fn preview(&mut self, document: &str) -> Result<Preview>;
}

/// Options the conversion engine consumes. Derived once from the render
/// options and embedded verbatim in the composed document's bootstrap
/// script, so the isolated context reads them back rather than sharing
/// state with the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvertOptions {
    pub page_size: PageSize,
    pub margin_left: f32,
    pub margin_right: f32,
    pub header_height: f32,
    pub footer_height: f32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::A4,
            margin_left: 10.0,
            margin_right: 10.0,
            header_height: 15.0,
            footer_height: 15.0,
        }
    }
}

/// A paged, binary intermediate produced by the conversion engine.
pub trait PagedOutput: Send {
    /// Number of pages currently in the output.
    fn page_count(&self) -> u32;

    /// Remove a page by 1-based index.
    fn delete_page(&mut self, page: u32) -> Result<()>;

    /// Assemble the final binary document.
    fn into_bytes(self: Box<Self>) -> Result<Vec<u8>>;
}

/// External conversion engine boundary.
pub trait ConversionEngine: Send {
    /// Convert `content` into a paged binary intermediate.
    fn convert(&mut self, content: &str, options: &ConvertOptions) -> Result<Box<dyn PagedOutput>>;
}

/// Builder over a [`ConversionEngine`], mirroring the engine's pipeline
/// shape: collect the target content and options, then run once.
pub struct Conversion<'a> {
    engine: &'a mut dyn ConversionEngine,
    content: String,
    options: ConvertOptions,
}

impl<'a> Conversion<'a> {
    pub fn new(engine: &'a mut dyn ConversionEngine) -> Self {
        Self {
            engine,
            content: String::new(),
            options: ConvertOptions::default(),
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn options(mut self, options: ConvertOptions) -> Self {
        self.options = options;
        self
    }

    pub fn run(self) -> Result<Box<dyn PagedOutput>> {
        self.engine.convert(&self.content, &self.options)
    }
}

/// Per-context provider of engine instances and font readiness.
///
/// Every isolated context owns one fresh pagination engine and one fresh
/// conversion engine for its lifetime; implementations hand them out here.
/// A provider that cannot supply a stage should fail from the
/// corresponding method so the failure surfaces as a conversion error.
pub trait ContextServices: Send + Sync {
    /// Block until font resources report ready.
    fn wait_fonts(&self) -> Result<()>;

    fn paginator(&self) -> Box<dyn PaginationEngine>;

    fn converter(&self) -> Box<dyn ConversionEngine>;
}
