//! Glyph record shared by the layout core and renderers

bitflags::bitflags! {
    /// Per-glyph flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct GlyphFlags: u8 {
        /// The glyph image must be drawn mirrored, used for paired
        /// punctuation inside right-to-left runs.
        const MIRRORED = 0x01;
    }
}

/// Placement metrics and atlas location for one glyph id.
///
/// All distances are in layout units (descriptor pixels divided by
/// `pixels_per_point` at load). The draw offset points from the pen position
/// to the bottom-left corner of the glyph quad, Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Glyph id; for bitmap fonts this is the Unicode code point.
    pub id: u32,
    /// Atlas page index, or `-1` when the glyph has no graphic.
    pub page: i32,
    /// Texture coordinates of the glyph rectangle.
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    /// Pen-to-quad draw offset.
    pub x_offset: f32,
    pub y_offset: f32,
    /// Quad size.
    pub width: f32,
    pub height: f32,
    /// Horizontal pen advance after placing this glyph.
    pub x_advance: f32,
    pub flags: GlyphFlags,
}

impl Glyph {
    /// Whether the glyph contributes pixels when drawn.
    #[inline]
    pub fn has_graphic(&self) -> bool {
        self.page >= 0
    }
}
