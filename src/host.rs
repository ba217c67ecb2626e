//! Execution host boundary: isolated-context creation and mount policy.
//!
//! The host environment is an external collaborator. This module defines
//! the trait surface the renderer consumes and the positioning policy that
//! decides where a context's frame lands: filling a resolved target node,
//! or parked off-screen against the document root.

use log::warn;

use crate::Result;

/// Fixed offset, in pixels, used for invisible off-screen mounts.
pub const OFFSCREEN_OFFSET_PX: i32 = -10000;

/// Where a context's frame is attached and how it is sized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramePlacement {
    /// Fill a resolved host node: full width and height, no border. The
    /// frame is visibly part of the host page.
    Fill { target: String },

    /// Fixed position at [`OFFSCREEN_OFFSET_PX`] on both axes, attached to
    /// the document root; the context executes without being visible.
    Offscreen,
}

/// Opaque identifier for a mounted context, minted by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(pub u64);

/// Context-side store materializing binary output into referenceable
/// artifact handles. References are context-scoped: they mean nothing
/// outside the host that minted them, and dereferencing consumes them.
pub trait BlobStore: Send + Sync {
    /// Store bytes and mint an opaque reference for them.
    fn store(&self, bytes: Vec<u8>) -> String;

    /// Take the bytes back out, consuming the entry. `None` for unknown
    /// or already-taken references.
    fn take(&self, blob_url: &str) -> Option<Vec<u8>>;
}

/// Host environment surface consumed by the renderer.
///
/// Implementations provide isolated rendering contexts, selector
/// resolution over the host page, and dereferencing of artifact
/// references minted inside those contexts.
pub trait HostEnvironment: Send + Sync {
    /// Whether this host can create isolated rendering contexts at all.
    /// The direct-conversion facade refuses to run when this is false.
    fn supports_isolated_contexts(&self) -> bool;

    /// Resolve a CSS-like selector against the host page, returning a
    /// handle for the first matching node. `None` when nothing matches or
    /// the selector does not parse.
    fn resolve(&self, selector: &str) -> Option<String>;

    /// Create one isolated context, inject `source` into its document (a
    /// single assignment), and let it begin executing. Must not wait for
    /// the context: execution is independent and asynchronous.
    fn create_context(&self, placement: FramePlacement, source: String) -> Result<ContextId>;

    /// Dereference an artifact reference into its bytes, consuming the
    /// stored entry.
    fn take_blob(&self, blob_url: &str) -> Option<Vec<u8>>;
}

/// Mount a composed document according to the positioning policy.
///
/// A resolved target gets a filled frame inside it. No target, or a
/// selector that resolves to nothing, falls back to an off-screen frame on
/// the document root. The unresolved case is not fatal, it just warns
/// with the selector text.
pub(crate) fn mount(
    host: &dyn HostEnvironment,
    source: String,
    target: Option<&str>,
) -> Result<ContextId> {
    let placement = match target {
        Some(selector) => match host.resolve(selector) {
            Some(node) => FramePlacement::Fill { target: node },
            None => {
                warn!(
                    "mount selector {:?} did not resolve; attaching off-screen to the document root",
                    selector
                );
                FramePlacement::Offscreen
            }
        },
        None => FramePlacement::Offscreen,
    };
    host.create_context(placement, source)
}
