//! Internal constants for diagram rendering.

use std::time::Duration;

/// Fence info string selecting diagram blocks.
pub const DIAGRAM_LANGUAGE: &str = "mermaid";

/// Default upper bound for one renderer invocation (60 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Marker every rendered SVG must contain.
pub(crate) const SVG_MARKER: &str = "<svg";

/// First eight bytes of every PNG file.
pub(crate) const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
