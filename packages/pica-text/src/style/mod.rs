//! Styled text: character buffer with ordered style regions
//!
//! A `StyledText` pairs a text buffer with an initial font and color plus an
//! ordered list of style regions. Region `k` applies from `start[k]`
//! inclusive to `start[k + 1]` exclusive (or end of text); starts are
//! strictly increasing and a region is never empty. Style lookup is a binary
//! search over the starts.

use std::sync::Arc;

use crate::error::LayoutError;
use crate::font::BitmapFont;
use crate::types::Color;

/// One style region. Applies from `start` to the next region's start.
#[derive(Debug, Clone)]
pub struct StyleRegion {
    pub start: usize,
    pub font: Arc<BitmapFont>,
    pub color: Color,
}

/// Text annotated with per-range font and color, tab stops, paragraph base
/// direction and an optional locale used for word-aware wrapping.
#[derive(Debug, Clone)]
pub struct StyledText {
    text: String,
    font: Arc<BitmapFont>,
    color: Color,
    paragraph_rtl: bool,
    locale: Option<String>,
    regions: Vec<StyleRegion>,
    tab_stops: Option<Vec<f32>>,
}

impl StyledText {
    pub fn new(text: impl Into<String>, font: Arc<BitmapFont>, color: Color) -> Self {
        Self {
            text: text.into(),
            font,
            color,
            paragraph_rtl: false,
            locale: None,
            regions: Vec::new(),
            tab_stops: None,
        }
    }

    /// Replace the character buffer. Existing regions are kept; the layout
    /// clamps any region now pointing past the end.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    #[inline]
    pub fn initial_font(&self) -> &Arc<BitmapFont> {
        &self.font
    }

    #[inline]
    pub fn initial_color(&self) -> Color {
        self.color
    }

    /// Paragraph base direction; `true` for right-to-left.
    #[inline]
    pub fn paragraph_rtl(&self) -> bool {
        self.paragraph_rtl
    }

    pub fn set_paragraph_rtl(&mut self, rtl: bool) {
        self.paragraph_rtl = rtl;
    }

    #[inline]
    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// A locale selects the Unicode line-breaking wrap path; `None` keeps the
    /// ASCII-whitespace fast path.
    pub fn set_locale(&mut self, locale: Option<String>) {
        self.locale = locale;
    }

    #[inline]
    pub fn regions(&self) -> &[StyleRegion] {
        &self.regions
    }

    /// Insert or replace the region starting at `start`; a duplicate start
    /// overwrites the existing region.
    pub fn add_region(
        &mut self,
        start: usize,
        font: Arc<BitmapFont>,
        color: Color,
    ) -> Result<(), LayoutError> {
        if start >= self.text.len() {
            return Err(LayoutError::InvalidArgument("region start beyond text"));
        }
        if !self.text.is_char_boundary(start) {
            return Err(LayoutError::InvalidArgument(
                "region start not on a character boundary",
            ));
        }
        let region = StyleRegion { start, font, color };
        match self.regions.binary_search_by_key(&start, |r| r.start) {
            Ok(i) => self.regions[i] = region,
            Err(i) => self.regions.insert(i, region),
        }
        Ok(())
    }

    pub fn remove_all_regions(&mut self) {
        self.regions.clear();
    }

    /// Font in effect at byte `index`.
    pub fn font_at(&self, index: usize) -> &Arc<BitmapFont> {
        match self.region_at(index) {
            Some(region) => &region.font,
            None => &self.font,
        }
    }

    /// Color in effect at byte `index`.
    pub fn color_at(&self, index: usize) -> Color {
        match self.region_at(index) {
            Some(region) => region.color,
            None => self.color,
        }
    }

    /// Region at or immediately before `index`, or `None` before the first
    /// region.
    fn region_at(&self, index: usize) -> Option<&StyleRegion> {
        match self.regions.binary_search_by_key(&index, |r| r.start) {
            Ok(i) => Some(&self.regions[i]),
            Err(0) => None,
            Err(i) => Some(&self.regions[i - 1]),
        }
    }

    /// Explicit left tab stops in layout units (strictly increasing), or
    /// `None` for the infinite default grid.
    pub fn set_tab_stops(&mut self, stops: Option<Vec<f32>>) {
        self.tab_stops = stops;
    }

    #[inline]
    pub fn tab_stops(&self) -> Option<&[f32]> {
        self.tab_stops.as_deref()
    }

    /// Smallest tab-stop index whose stop lies right of `x`. With the default
    /// grid this is `floor(x / default_advance) + 1` and always exists; with
    /// explicit stops, `None` once the line has passed the last stop.
    pub fn tab_stop_index_for(&self, x: f32, default_advance: f32) -> Option<usize> {
        match &self.tab_stops {
            Some(stops) => {
                let i = stops.partition_point(|&stop| stop <= x);
                (i < stops.len()).then_some(i)
            }
            None => {
                if default_advance <= 0.0 {
                    return None;
                }
                Some((x / default_advance).floor() as usize + 1)
            }
        }
    }

    /// X coordinate of tab stop `index`; inverse of
    /// [`tab_stop_index_for`](Self::tab_stop_index_for).
    pub fn tab_stop_offset_for(&self, index: usize, default_advance: f32) -> f32 {
        match &self.tab_stops {
            Some(stops) => stops.get(index).copied().unwrap_or_else(|| {
                stops.last().copied().unwrap_or(0.0)
            }),
            None => index as f32 * default_advance,
        }
    }
}
