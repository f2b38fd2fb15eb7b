//! Status glyphs prepended to operator-facing log lines.
//!
//! Progress output is streamed verbatim to dashboards, so the markers
//! live here rather than being scattered through format strings.

/// Step or workflow finished cleanly.
pub const GLYPH_SUCCESS: &str = "✅";

/// Finished, but at least one unit of work failed.
pub const GLYPH_WARNING: &str = "⚠️";

/// Neutral progress information.
pub const GLYPH_INFO: &str = "ℹ️";
