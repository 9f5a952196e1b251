//! Text run segmentation
//!
//! Splits a [`StyledText`] into an ordered sequence of segments covering the
//! whole text exactly once. Segment boundaries occur at style changes, BiDi
//! level changes, immediately before a tab or line terminator, and after a
//! tab or line terminator. Tab and linebreak segments are one character long
//! (two for `\r\n`) and carry the corresponding flag.
//!
//! Segments are emitted in logical order; visual reordering happens per line
//! in the layout engine. Paragraph BiDi levels come from `unicode_bidi`; a
//! fast path skips the full algorithm for text that cannot need it.

use std::sync::Arc;

use unicode_bidi::{BidiInfo, Level};

use crate::font::BitmapFont;
use crate::style::StyledText;
use crate::types::Color;

bitflags::bitflags! {
    /// Flags carried by special segments.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SegmentFlags: u8 {
        const TAB = 0x01;
        const LINEBREAK = 0x02;
    }
}

/// A maximal homogeneous span of the source text.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Half-open byte range into the source text.
    pub start: usize,
    pub end: usize,
    pub font: Arc<BitmapFont>,
    pub color: Color,
    /// Resolved BiDi embedding level; even is left-to-right.
    pub level: Level,
    pub flags: SegmentFlags,
}

impl Segment {
    #[inline]
    pub fn is_rtl(&self) -> bool {
        self.level.is_rtl()
    }
}

/// Lazy pull iterator over the segments of a styled text.
pub struct TextRunSegmenter<'a> {
    text: &'a StyledText,
    /// Per-byte resolved levels, or `None` when the whole paragraph shares
    /// the base level.
    levels: Option<Vec<Level>>,
    paragraph_level: Level,
    pos: usize,
}

impl<'a> TextRunSegmenter<'a> {
    pub fn new(text: &'a StyledText) -> Self {
        let paragraph_level = if text.paragraph_rtl() {
            Level::rtl()
        } else {
            Level::ltr()
        };
        let levels = if needs_bidi(text.text(), text.paragraph_rtl()) {
            let info = BidiInfo::new(text.text(), Some(paragraph_level));
            Some(info.levels)
        } else {
            None
        };
        Self {
            text,
            levels,
            paragraph_level,
            pos: 0,
        }
    }

    #[inline]
    pub fn paragraph_level(&self) -> Level {
        self.paragraph_level
    }

    #[inline]
    fn level_at(&self, index: usize) -> Level {
        match &self.levels {
            Some(levels) => levels[index],
            None => self.paragraph_level,
        }
    }
}

impl Iterator for TextRunSegmenter<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let source = self.text.text();
        if self.pos >= source.len() {
            return None;
        }
        let start = self.pos;
        let font = self.text.font_at(start).clone();
        let color = self.text.color_at(start);
        let bytes = source.as_bytes();

        // Tab and linebreak segments take the paragraph level outright; their
        // own direction never influences reordering.
        match bytes[start] {
            b'\t' => {
                self.pos = start + 1;
                return Some(Segment {
                    start,
                    end: self.pos,
                    font,
                    color,
                    level: self.paragraph_level,
                    flags: SegmentFlags::TAB,
                });
            }
            b'\r' => {
                self.pos = if bytes.get(start + 1) == Some(&b'\n') {
                    start + 2
                } else {
                    start + 1
                };
                return Some(Segment {
                    start,
                    end: self.pos,
                    font,
                    color,
                    level: self.paragraph_level,
                    flags: SegmentFlags::LINEBREAK,
                });
            }
            b'\n' => {
                self.pos = start + 1;
                return Some(Segment {
                    start,
                    end: self.pos,
                    font,
                    color,
                    level: self.paragraph_level,
                    flags: SegmentFlags::LINEBREAK,
                });
            }
            _ => {}
        }

        let level = self.level_at(start);
        let mut end = source.len();
        for (offset, ch) in source[start..].char_indices().skip(1) {
            let i = start + offset;
            if matches!(ch, '\t' | '\r' | '\n')
                || self.level_at(i) != level
                || !Arc::ptr_eq(self.text.font_at(i), &font)
                || self.text.color_at(i) != color
            {
                end = i;
                break;
            }
        }
        self.pos = end;
        Some(Segment {
            start,
            end,
            font,
            color,
            level,
            flags: SegmentFlags::empty(),
        })
    }
}

/// Whether the paragraph needs the full bidirectional algorithm.
///
/// Left-to-right text below U+0590 can only resolve to level 0, so the scan
/// is a cheap byte check. Any right-to-left base runs the full algorithm:
/// strong LTR characters and numbers inside it produce nested levels.
fn needs_bidi(text: &str, paragraph_rtl: bool) -> bool {
    if paragraph_rtl {
        !text.is_empty()
    } else {
        text.bytes().any(|b| b >= 0xD6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{BitmapFont, KerningTable, LineMetrics};

    fn test_font() -> Arc<BitmapFont> {
        Arc::new(BitmapFont::from_parts(
            "test",
            LineMetrics {
                line_height: 16.0,
                base: 12.0,
                space_x_advance: 10.0,
            },
            Vec::new(),
            KerningTable::default(),
        ))
    }

    fn segments(text: &StyledText) -> Vec<Segment> {
        TextRunSegmenter::new(text).collect()
    }

    #[test]
    fn plain_text_is_one_segment() {
        let text = StyledText::new("hello", test_font(), 0);
        let segs = segments(&text);
        assert_eq!(segs.len(), 1);
        assert_eq!((segs[0].start, segs[0].end), (0, 5));
        assert!(segs[0].flags.is_empty());
        assert!(!segs[0].is_rtl());
    }

    #[test]
    fn tabs_and_linebreaks_split_out() {
        let text = StyledText::new("a\tb\r\nc", test_font(), 0);
        let segs = segments(&text);
        let spans: Vec<(usize, usize, SegmentFlags)> =
            segs.iter().map(|s| (s.start, s.end, s.flags)).collect();
        assert_eq!(
            spans,
            vec![
                (0, 1, SegmentFlags::empty()),
                (1, 2, SegmentFlags::TAB),
                (2, 3, SegmentFlags::empty()),
                (3, 5, SegmentFlags::LINEBREAK),
                (5, 6, SegmentFlags::empty()),
            ]
        );
    }

    #[test]
    fn style_change_starts_a_new_segment() {
        let font = test_font();
        let mut text = StyledText::new("abcd", font.clone(), 0);
        text.add_region(2, font, 1).unwrap();
        let segs = segments(&text);
        assert_eq!(segs.len(), 2);
        assert_eq!((segs[0].start, segs[0].end), (0, 2));
        assert_eq!((segs[1].start, segs[1].end), (2, 4));
        assert_eq!(segs[1].color, 1);
    }

    #[test]
    fn identical_style_region_does_not_split() {
        let font = test_font();
        let mut text = StyledText::new("abcd", font.clone(), 7);
        text.add_region(2, font, 7).unwrap();
        assert_eq!(segments(&text).len(), 1);
    }

    #[test]
    fn mixed_direction_splits_on_level() {
        let text = StyledText::new("abc\u{05D0}\u{05D1}def", test_font(), 0);
        let segs = segments(&text);
        assert_eq!(segs.len(), 3);
        assert!(!segs[0].is_rtl());
        assert!(segs[1].is_rtl());
        assert!(!segs[2].is_rtl());
    }

    #[test]
    fn rtl_paragraph_gives_odd_levels() {
        let mut text = StyledText::new("\u{05D0}\u{05D1}", test_font(), 0);
        text.set_paragraph_rtl(true);
        let segs = segments(&text);
        assert_eq!(segs.len(), 1);
        assert!(segs[0].is_rtl());
    }

    #[test]
    fn segments_cover_text_exactly_once() {
        let text = StyledText::new("a\tb\nc \u{05D0} d", test_font(), 0);
        let segs = segments(&text);
        let mut pos = 0;
        for seg in &segs {
            assert_eq!(seg.start, pos);
            pos = seg.end;
        }
        assert_eq!(pos, text.len());
    }
}
