//! Shared domain primitives for the Drydock orchestration core.
//!
//! This crate holds the pieces every other crate agrees on: id and
//! timestamp aliases, the queue/job-key naming convention, and the glyph
//! prefixes used in operator-facing progress messages. It has no I/O and
//! no internal dependencies; errors live with the layer that raises them.

pub mod glyphs;
pub mod naming;
pub mod types;
