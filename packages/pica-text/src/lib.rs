//! Bitmap-font paragraph layout engine for Pica
//!
//! This crate turns styled, multi-directional text into positioned glyph
//! runs ready for GPU-batched rendering:
//! - per-range font and color through [`StyledText`] regions or markup
//! - bidirectional segmentation and per-line visual reordering
//! - kerned glyph synthesis with whitespace collapse
//! - word-aware soft wrapping and ellipsis truncation under width/height
//!   budgets
//! - character inverse indices for caret placement, hit testing and edit
//!   navigation

pub mod atlas;
pub mod error;
pub mod font;
pub mod layout;
pub mod markup;
pub mod segment;
pub mod style;
pub mod types;

pub use atlas::{AtlasPage, ImagePacker, PackedRect, Trim};
pub use error::{FontError, LayoutError};
pub use font::{BitmapFont, FontState, Glyph, GlyphFlags, KerningTable, LineMetrics};
pub use layout::{with_context, GlyphRun, Layout, LayoutContext, RunFlags};
pub use markup::MarkupParser;
pub use segment::{Segment, SegmentFlags, TextRunSegmenter};
pub use style::{StyleRegion, StyledText};
pub use types::{Color, HeightLimit, HorizontalAlign, LayoutOptions, Rect};
