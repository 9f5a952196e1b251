//! Shared helpers: a stub font with uniform metrics and layout shorthands.
#![allow(dead_code)]

use std::sync::Arc;

use pica_text::{
    BitmapFont, Glyph, GlyphFlags, KerningTable, Layout, LayoutOptions, LineMetrics, RunFlags,
    StyledText,
};

pub const WHITE: u32 = 0xFFFFFFFF;

/// Every stub glyph is 10 units wide; `space_x_advance` 10, `base` 12,
/// `line_height` 16, no kerning unless supplied.
pub fn stub_glyph(id: u32) -> Glyph {
    Glyph {
        id,
        page: 0,
        u: 0.0,
        v: 0.0,
        u2: 1.0,
        v2: 1.0,
        x_offset: 0.0,
        y_offset: 0.0,
        width: 10.0,
        height: 10.0,
        x_advance: 10.0,
        flags: GlyphFlags::empty(),
    }
}

pub fn stub_metrics() -> LineMetrics {
    LineMetrics {
        line_height: 16.0,
        base: 12.0,
        space_x_advance: 10.0,
    }
}

pub fn stub_font_with_kerning(pairs: Vec<(u32, u32, i32)>) -> Arc<BitmapFont> {
    let mut glyphs = vec![stub_glyph(0)];
    for id in 0x21..=0x7E {
        glyphs.push(stub_glyph(id));
    }
    // Hebrew block, the ellipsis and a couple of brackets' mirrors are
    // already in ASCII.
    for id in 0x05D0..=0x05EA {
        glyphs.push(stub_glyph(id));
    }
    glyphs.push(stub_glyph(0x2026));
    Arc::new(BitmapFont::from_parts(
        "stub",
        stub_metrics(),
        glyphs,
        KerningTable::from_pairs(pairs),
    ))
}

pub fn stub_font() -> Arc<BitmapFont> {
    stub_font_with_kerning(Vec::new())
}

pub fn styled(text: &str) -> StyledText {
    StyledText::new(text, stub_font(), WHITE)
}

pub fn laid_out(text: &StyledText, options: &LayoutOptions) -> Layout {
    let mut layout = Layout::new();
    layout.layout(text, options).expect("layout");
    layout
}

pub fn assert_close(actual: f32, expected: f32) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

/// Finite character positions of a run, in logical order.
pub fn finite_positions(layout: &Layout, run: usize) -> Vec<f32> {
    layout.runs()[run]
        .character_positions
        .iter()
        .copied()
        .filter(|p| !p.is_nan())
        .collect()
}

/// Check the universal post-layout invariants.
pub fn assert_invariants(layout: &Layout) {
    // Runs are ordered by (line, x).
    for pair in layout.runs().windows(2) {
        assert!(
            pair[0].line < pair[1].line || (pair[0].line == pair[1].line && pair[0].x <= pair[1].x),
            "runs out of (line, x) order"
        );
    }

    // Character lookup lands inside the run for every covered byte.
    for run in layout.runs() {
        if run.flags.contains(RunFlags::ELLIPSIS) {
            continue;
        }
        for byte in run.chars_start..run.chars_end {
            let found = layout
                .run_index_of(byte, false)
                .unwrap_or_else(|| panic!("byte {byte} not indexed"));
            let owner = &layout.runs()[found];
            assert!(
                owner.chars_start <= byte && byte < owner.chars_end,
                "index lookup missed byte {byte}"
            );
        }
    }

    // Finite positions are monotone in visual X per direction, and the
    // implied widths add up to the run width.
    for run in layout.runs() {
        if run.flags.contains(RunFlags::ELLIPSIS) {
            continue;
        }
        let finite: Vec<f32> = run
            .character_positions
            .iter()
            .copied()
            .filter(|p| !p.is_nan())
            .collect();
        for pair in finite.windows(2) {
            if run.is_ltr() {
                assert!(pair[0] <= pair[1] + 1e-3, "LTR positions not ascending");
            } else {
                assert!(pair[0] + 1e-3 >= pair[1], "RTL positions not descending");
            }
        }
        if let (Some(&first), Some(&last)) = (finite.first(), finite.last()) {
            let span_sum = if run.is_ltr() {
                (last - first) + (run.width - last)
            } else {
                (first - last) + last
            };
            assert!(
                (span_sum - run.width).abs() < 1e-2,
                "position spans do not add up to run width"
            );
        }
    }

    // Cumulative line heights are strictly increasing and end at height().
    assert!(!layout.line_heights().is_empty());
    for pair in layout.line_heights().windows(2) {
        assert!(pair[0] < pair[1], "line heights not strictly increasing");
    }
    assert_close(
        layout.line_heights().last().copied().unwrap_or(0.0),
        layout.height(),
    );

    // width stays within the aligned box unless content itself overflows it.
    let extent = layout
        .runs()
        .iter()
        .map(|r| r.x + r.width)
        .fold(0.0f32, f32::max);
    assert!(layout.width() <= layout.align_width().max(extent) + 1e-3);
}
