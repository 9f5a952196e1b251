//! Glyph run: one homogeneous span of positioned glyphs on one line

use std::sync::Arc;

use unicode_bidi::Level;

use crate::font::{BitmapFont, Glyph};
use crate::types::Color;

bitflags::bitflags! {
    /// Run-level flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RunFlags: u8 {
        /// The run stands for a line terminator; zero width, no glyphs.
        const LINEBREAK = 0x01;
        /// The run stands for a tab character.
        const TAB = 0x02;
        /// Synthesized truncation marker; carries no inverse-index entries.
        const ELLIPSIS = 0x04;
        /// The run ends in a glyph, so a following run of the same font and
        /// level on the same line may kern against it.
        const KERN_TO_LAST_GLYPH = 0x08;
    }
}

/// Wrap-time re-split hint: glyph count at a character boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Checkpoint {
    /// Byte offset into the source text.
    pub byte: usize,
    /// Number of glyphs emitted before this character.
    pub glyph: usize,
}

/// A maximal span of homogeneous style, direction and line, with positioned
/// glyphs and the per-character inverse-mapping data.
///
/// Instances circulate through a per-thread pool; all vectors keep their
/// capacity across reuse.
#[derive(Debug, Clone)]
pub struct GlyphRun {
    /// X of the run origin: left edge of its span on the line.
    pub x: f32,
    /// Baseline-adjusted Y of the run origin; Y grows downward.
    pub y: f32,
    /// Pen-measured advance width.
    pub width: f32,
    /// 0-based line number.
    pub line: usize,
    pub font: Arc<BitmapFont>,
    pub color: Color,
    pub glyphs: Vec<Glyph>,
    /// Pen-point coordinates relative to the run origin, parallel to
    /// `glyphs`.
    pub glyph_x: Vec<f32>,
    pub glyph_y: Vec<f32>,
    /// Half-open byte range into the source text.
    pub chars_start: usize,
    pub chars_end: usize,
    /// For each byte of the range: the X of the character's leading edge
    /// (left for LTR, right for RTL), or NaN when the byte does not begin a
    /// grapheme cluster. The nearest preceding non-NaN value is the
    /// effective position.
    pub character_positions: Vec<f32>,
    /// Resolved BiDi level; even means left-to-right.
    pub level: Level,
    pub flags: RunFlags,
    pub(crate) checkpoints: Option<Vec<Checkpoint>>,
}

impl GlyphRun {
    pub(crate) fn new(font: Arc<BitmapFont>) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 0.0,
            line: 0,
            font,
            color: 0,
            glyphs: Vec::new(),
            glyph_x: Vec::new(),
            glyph_y: Vec::new(),
            chars_start: 0,
            chars_end: 0,
            character_positions: Vec::new(),
            level: Level::ltr(),
            flags: RunFlags::empty(),
            checkpoints: None,
        }
    }

    /// Clear every field for reuse; capacity of the arrays is retained, the
    /// transient checkpoint array is released.
    pub(crate) fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.width = 0.0;
        self.line = 0;
        self.color = 0;
        self.glyphs.clear();
        self.glyph_x.clear();
        self.glyph_y.clear();
        self.chars_start = 0;
        self.chars_end = 0;
        self.character_positions.clear();
        self.level = Level::ltr();
        self.flags = RunFlags::empty();
        self.checkpoints = None;
    }

    #[inline]
    pub fn is_ltr(&self) -> bool {
        self.level.is_ltr()
    }

    /// Number of source bytes the run covers.
    #[inline]
    pub fn char_len(&self) -> usize {
        self.chars_end - self.chars_start
    }

    /// Whether byte `index` of the source text falls inside this run.
    #[inline]
    pub fn contains_char(&self, index: usize) -> bool {
        (self.chars_start..self.chars_end).contains(&index)
    }

    /// Effective leading-edge position of byte `index`, following NaN
    /// propagation to the nearest preceding finite entry.
    pub fn position_of(&self, index: usize) -> f32 {
        debug_assert!(self.contains_char(index));
        if self.character_positions.is_empty() {
            return 0.0;
        }
        let local = index - self.chars_start;
        self.character_positions[..=local.min(self.character_positions.len() - 1)]
            .iter()
            .rev()
            .copied()
            .find(|p| !p.is_nan())
            .unwrap_or(0.0)
    }

    /// Width the run occupies when drawn: at least the pen advance, extended
    /// by any glyph quad overhanging the last pen position.
    pub fn draw_width(&self) -> f32 {
        let mut width = self.width;
        for (glyph, &gx) in self.glyphs.iter().zip(&self.glyph_x) {
            width = width.max(gx + glyph.x_offset + glyph.width);
        }
        width
    }

    /// Record a wrap checkpoint; only text runs carry them, and only for the
    /// duration of one layout call.
    #[inline]
    pub(crate) fn push_checkpoint(&mut self, byte: usize, glyph: usize) {
        self.checkpoints
            .get_or_insert_with(Vec::new)
            .push(Checkpoint { byte, glyph });
    }

    /// Glyph count emitted before `byte`, from the checkpoint table.
    pub(crate) fn checkpoint_glyphs_before(&self, byte: usize) -> Option<usize> {
        let checkpoints = self.checkpoints.as_ref()?;
        match checkpoints.binary_search_by_key(&byte, |c| c.byte) {
            Ok(i) => Some(checkpoints[i].glyph),
            Err(_) => None,
        }
    }
}
