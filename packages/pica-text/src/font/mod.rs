//! Bitmap font: glyph table, kerning, line metrics and atlas pages
//!
//! A font moves through a one-time state machine:
//! `Initial -> GlyphsLoaded -> Initialized{OwnsPages | BorrowsPages} ->
//! Disposed`. Glyph metrics are loaded from a text descriptor,
//! pages either stay with the font as whole textures or are re-packed into an
//! external [`ImagePacker`](crate::atlas::ImagePacker) with transparent-border
//! trimming.

pub(crate) mod descriptor;
pub mod glyph;
pub mod kerning;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use image::RgbaImage;
use log::debug;

use crate::atlas::ImagePacker;
use crate::error::FontError;
pub use glyph::{Glyph, GlyphFlags};
pub use kerning::KerningTable;

/// Vertical metrics of a font, in layout units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance between consecutive baselines.
    pub line_height: f32,
    /// Distance from the top of a line to its baseline.
    pub base: f32,
    /// Advance of the collapsible ASCII space.
    pub space_x_advance: f32,
}

/// Lifecycle states of a [`BitmapFont`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FontState {
    Initial = 0,
    GlyphsLoaded = 1,
    InitializedOwnsPages = 2,
    InitializedBorrowsPages = 3,
    Disposed = 4,
}

impl FontState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => FontState::Initial,
            1 => FontState::GlyphsLoaded,
            2 => FontState::InitializedOwnsPages,
            3 => FontState::InitializedBorrowsPages,
            _ => FontState::Disposed,
        }
    }

    fn name(self) -> &'static str {
        match self {
            FontState::Initial => "Initial",
            FontState::GlyphsLoaded => "GlyphsLoaded",
            FontState::InitializedOwnsPages => "InitializedOwnsPages",
            FontState::InitializedBorrowsPages => "InitializedBorrowsPages",
            FontState::Disposed => "Disposed",
        }
    }
}

/// Source rectangle of a glyph in descriptor pixels, kept until pages bind.
#[derive(Debug, Clone, Copy, Default)]
struct SourceRect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    page: u32,
}

/// Immutable-after-initialization bitmap font.
pub struct BitmapFont {
    name: String,
    fallback: Option<Arc<BitmapFont>>,
    metrics: LineMetrics,
    /// Sorted by id, binary searched.
    glyphs: Vec<Glyph>,
    source_rects: Vec<SourceRect>,
    kerning: KerningTable,
    /// Raw kerning amounts are in descriptor pixels; queries scale by this.
    kerning_scale: f32,
    /// Page file names from the descriptor, resolved against the descriptor
    /// directory when loaded from disk.
    page_files: Vec<PathBuf>,
    /// Owned page textures (`InitializedOwnsPages` only).
    pages: Vec<RgbaImage>,
    state: AtomicU8,
}

impl BitmapFont {
    /// Parse a descriptor string. The returned font is in `GlyphsLoaded`
    /// state; glyph UVs are valid only after one of the `initialize_*` calls.
    ///
    /// `pixels_per_point` divides every pixel-valued descriptor field.
    pub fn from_descriptor(
        name: impl Into<String>,
        text: &str,
        pixels_per_point: f32,
    ) -> Result<Self, FontError> {
        let parsed = descriptor::parse(text)?;
        let scale = 1.0 / pixels_per_point;

        let mut glyphs = Vec::with_capacity(parsed.chars.len());
        let mut source_rects = Vec::with_capacity(parsed.chars.len());
        let mut order: Vec<usize> = (0..parsed.chars.len()).collect();
        order.sort_by_key(|&i| parsed.chars[i].id);
        for i in order {
            let raw = parsed.chars[i];
            // Descriptor yoffset measures top-of-line to top-of-rect, Y down;
            // glyphs store baseline to bottom-of-rect, Y up.
            let y_up_offset = parsed.base - raw.y_offset - raw.height as i32;
            glyphs.push(Glyph {
                id: raw.id,
                page: if raw.width == 0 || raw.height == 0 {
                    -1
                } else {
                    raw.page as i32
                },
                u: 0.0,
                v: 0.0,
                u2: 0.0,
                v2: 0.0,
                x_offset: raw.x_offset as f32 * scale,
                y_offset: y_up_offset as f32 * scale,
                width: raw.width as f32 * scale,
                height: raw.height as f32 * scale,
                x_advance: raw.x_advance as f32 * scale,
                flags: GlyphFlags::empty(),
            });
            source_rects.push(SourceRect {
                x: raw.x,
                y: raw.y,
                width: raw.width,
                height: raw.height,
                page: raw.page,
            });
        }

        let space_x_advance = glyphs
            .binary_search_by_key(&0x20u32, |g: &Glyph| g.id)
            .ok()
            .map(|i| glyphs[i].x_advance)
            .unwrap_or(parsed.line_height as f32 * scale / 2.0);

        Ok(Self {
            name: name.into(),
            fallback: None,
            metrics: LineMetrics {
                line_height: parsed.line_height as f32 * scale,
                base: parsed.base as f32 * scale,
                space_x_advance,
            },
            glyphs,
            source_rects,
            kerning: KerningTable::from_pairs(parsed.kernings),
            kerning_scale: scale,
            page_files: parsed.pages.iter().map(PathBuf::from).collect(),
            pages: Vec::new(),
            state: AtomicU8::new(FontState::GlyphsLoaded as u8),
        })
    }

    /// Read a descriptor file from disk; page file names resolve against the
    /// descriptor's directory.
    pub fn load(path: impl AsRef<Path>, pixels_per_point: f32) -> Result<Self, FontError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut font = Self::from_descriptor(name, &text, pixels_per_point)?;
        if let Some(dir) = path.parent() {
            for file in &mut font.page_files {
                *file = dir.join(&*file);
            }
        }
        Ok(font)
    }

    /// Construct a font directly from parts, already in layout units. Used by
    /// callers that synthesize fonts (and by tests).
    pub fn from_parts(
        name: impl Into<String>,
        metrics: LineMetrics,
        mut glyphs: Vec<Glyph>,
        kerning: KerningTable,
    ) -> Self {
        glyphs.sort_by_key(|g| g.id);
        glyphs.dedup_by_key(|g| g.id);
        let source_rects = vec![SourceRect::default(); glyphs.len()];
        Self {
            name: name.into(),
            fallback: None,
            metrics,
            glyphs,
            source_rects,
            kerning,
            kerning_scale: 1.0,
            page_files: Vec::new(),
            pages: Vec::new(),
            state: AtomicU8::new(FontState::InitializedOwnsPages as u8),
        }
    }

    /// Bind the supplied images as this font's own pages and compute UVs.
    pub fn initialize_with_pages(&mut self, pages: Vec<RgbaImage>) -> Result<(), FontError> {
        self.expect_state(FontState::GlyphsLoaded)?;
        if pages.len() != self.page_files.len() {
            return Err(FontError::PageCountMismatch {
                declared: self.page_files.len(),
                supplied: pages.len(),
            });
        }
        for (glyph, rect) in self.glyphs.iter_mut().zip(&self.source_rects) {
            if glyph.page < 0 {
                continue;
            }
            let Some(page) = pages.get(rect.page as usize) else {
                glyph.page = -1;
                continue;
            };
            let (pw, ph) = (page.width() as f32, page.height() as f32);
            glyph.u = rect.x as f32 / pw;
            glyph.v = rect.y as f32 / ph;
            glyph.u2 = (rect.x + rect.width) as f32 / pw;
            glyph.v2 = (rect.y + rect.height) as f32 / ph;
        }
        self.pages = pages;
        self.source_rects = Vec::new();
        self.state
            .store(FontState::InitializedOwnsPages as u8, Ordering::Release);
        debug!("font {:?} initialized owning {} pages", self.name, self.pages.len());
        Ok(())
    }

    /// Load the descriptor-referenced page images from disk and own them.
    pub fn initialize_from_files(&mut self) -> Result<(), FontError> {
        self.expect_state(FontState::GlyphsLoaded)?;
        let mut pages = Vec::with_capacity(self.page_files.len());
        for file in &self.page_files {
            if !file.exists() {
                return Err(FontError::MissingPage(file.clone()));
            }
            pages.push(image::open(file)?.into_rgba8());
        }
        self.initialize_with_pages(pages)
    }

    /// Re-pack every glyph into `packer`, trimming transparent borders, and
    /// borrow the packer's pages. The font keeps no pixels of its own; glyph
    /// `page` indices address the packer's arena.
    pub fn initialize_into_packer(
        &mut self,
        packer: &mut ImagePacker,
        pages: &[RgbaImage],
    ) -> Result<(), FontError> {
        self.expect_state(FontState::GlyphsLoaded)?;
        if pages.len() != self.page_files.len() {
            return Err(FontError::PageCountMismatch {
                declared: self.page_files.len(),
                supplied: pages.len(),
            });
        }
        let scale = self.kerning_scale;
        for (glyph, rect) in self.glyphs.iter_mut().zip(&self.source_rects) {
            if glyph.page < 0 {
                continue;
            }
            let Some(page) = pages.get(rect.page as usize) else {
                glyph.page = -1;
                continue;
            };
            if rect.x + rect.width > page.width() || rect.y + rect.height > page.height() {
                glyph.page = -1;
                continue;
            }
            let view = image::GenericImageView::view(page, rect.x, rect.y, rect.width, rect.height)
                .to_image();
            match packer.pack_trimmed(&view) {
                None => {
                    // Nothing opaque left; the glyph keeps its advance only.
                    glyph.page = -1;
                    glyph.width = 0.0;
                    glyph.height = 0.0;
                }
                Some((packed, trim)) => {
                    let packed_page = packer
                        .page(packed.page)
                        .map(|p| (p.width() as f32, p.height() as f32))
                        .unwrap_or((1.0, 1.0));
                    glyph.x_offset += trim.left as f32 * scale;
                    // Bottom trim raises the quad's bottom edge (Y up).
                    glyph.y_offset += trim.bottom as f32 * scale;
                    glyph.width -= (trim.left + trim.right) as f32 * scale;
                    glyph.height -= (trim.top + trim.bottom) as f32 * scale;
                    glyph.page = packed.page as i32;
                    glyph.u = packed.x as f32 / packed_page.0;
                    glyph.v = packed.y as f32 / packed_page.1;
                    glyph.u2 = (packed.x + packed.width) as f32 / packed_page.0;
                    glyph.v2 = (packed.y + packed.height) as f32 / packed_page.1;
                }
            }
        }
        self.source_rects = Vec::new();
        self.state
            .store(FontState::InitializedBorrowsPages as u8, Ordering::Release);
        debug!("font {:?} initialized borrowing packer pages", self.name);
        Ok(())
    }

    /// Attach a fallback consulted by [`glyph`](Self::glyph) on a miss.
    /// Chains formed this way are acyclic by construction.
    pub fn set_fallback(&mut self, fallback: Option<Arc<BitmapFont>>) {
        self.fallback = fallback;
    }

    /// Look up a glyph by id, traversing the fallback chain.
    pub fn glyph(&self, id: u32) -> Option<&Glyph> {
        match self.glyphs.binary_search_by_key(&id, |g| g.id) {
            Ok(i) => Some(&self.glyphs[i]),
            Err(_) => self.fallback.as_deref().and_then(|f| f.glyph(id)),
        }
    }

    /// Kerning between two glyph ids in layout units; 0 for unknown pairs.
    #[inline]
    pub fn kerning(&self, first: u32, second: u32) -> f32 {
        if self.kerning.is_empty() {
            return 0.0;
        }
        self.kerning.amount(first, second) as f32 * self.kerning_scale
    }

    #[inline]
    pub fn metrics(&self) -> LineMetrics {
        self.metrics
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn fallback(&self) -> Option<&Arc<BitmapFont>> {
        self.fallback.as_ref()
    }

    #[inline]
    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    /// Owned page textures; empty when the font borrows packer pages.
    pub fn pages(&self) -> Result<&[RgbaImage], FontError> {
        if self.is_disposed() {
            return Err(FontError::InvalidState {
                expected: "Initialized",
                found: FontState::Disposed.name(),
            });
        }
        Ok(&self.pages)
    }

    #[inline]
    pub fn state(&self) -> FontState {
        FontState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.state() == FontState::Disposed
    }

    /// Mark the font disposed. Shared handles keep the allocation alive, but
    /// any further layout or page access surfaces an error.
    pub fn dispose(&self) {
        self.state
            .store(FontState::Disposed as u8, Ordering::Release);
    }

    fn expect_state(&self, expected: FontState) -> Result<(), FontError> {
        let found = self.state();
        if found == expected {
            Ok(())
        } else {
            Err(FontError::InvalidState {
                expected: expected.name(),
                found: found.name(),
            })
        }
    }
}

impl std::fmt::Debug for BitmapFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BitmapFont")
            .field("name", &self.name)
            .field("glyphs", &self.glyphs.len())
            .field("kerning", &self.kerning.len())
            .field("state", &self.state())
            .finish()
    }
}
