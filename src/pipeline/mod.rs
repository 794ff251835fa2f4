//! Pipeline stages for marker generation and form extraction.
//!
//! Each submodule implements exactly one step, so each is testable on its
//! own and the orchestration in [`crate::extract`] stays a flat sequence.
//!
//! ## Data Flow
//!
//! ```text
//! codec ──▶ layout ──▶ (printed, filled in, scanned)
//!
//! input ──▶ render ──▶ codec::scan ─┐
//!                                    ├──▶ populate ──▶ export
//! analysis job ──▶ resolve ─────────┘
//! ```
//!
//! 1. [`codec`]    — QR marker encode / decode
//! 2. [`layout`]   — place markers on a page; raster or PDF output
//! 3. [`encode`]   — PNG output for markers and composed pages
//! 4. [`input`]    — canonicalise the user-supplied path or URL
//! 5. [`render`]   — rasterise PDF pages via pdfium for marker scanning
//! 6. [`resolve`]  — block graph → key/value pairs
//! 7. [`populate`] — pairs → one section's field slots
//! 8. [`export`]   — template → sorted records → CSV
//! 9. [`verify`]   — QA: expected marker present on each rendered page

pub mod codec;
pub mod encode;
pub mod export;
pub mod input;
pub mod layout;
pub mod populate;
pub mod render;
pub mod resolve;
pub mod verify;
