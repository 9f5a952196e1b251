//! Font loading, page binding and fallback behavior.

use std::sync::Arc;

use image::{Rgba, RgbaImage};
use pica_text::{BitmapFont, FontError, FontState, ImagePacker};

const DESCRIPTOR: &str = r#"
info face="demo" size=16
common lineHeight=32 base=24 pages=1
page id=0 file="demo_0.png"
char id=32 x=0 y=0 width=0 height=0 xoffset=0 yoffset=0 xadvance=8 page=0
char id=65 x=0 y=0 width=8 height=12 xoffset=1 yoffset=10 xadvance=10 page=0
char id=66 x=8 y=0 width=8 height=12 xoffset=1 yoffset=10 xadvance=10 page=0
kerning first=65 second=66 amount=-4
"#;

fn page_image() -> RgbaImage {
    let mut image = RgbaImage::new(32, 32);
    for y in 0..12 {
        for x in 0..16 {
            image.put_pixel(x, y, Rgba([255, 255, 255, 255]));
        }
    }
    image
}

#[test]
fn descriptor_loads_metrics_and_glyphs() {
    let font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    assert_eq!(font.state(), FontState::GlyphsLoaded);
    let metrics = font.metrics();
    assert_eq!(metrics.line_height, 32.0);
    assert_eq!(metrics.base, 24.0);
    // Space advance comes from the space glyph.
    assert_eq!(metrics.space_x_advance, 8.0);

    let a = font.glyph('A' as u32).expect("glyph A");
    assert_eq!(a.x_advance, 10.0);
    // yoffset converts from top-of-line/top-of-rect to baseline/bottom,
    // Y up: 24 - 10 - 12 = 2.
    assert_eq!(a.y_offset, 2.0);
    assert_eq!(font.kerning('A' as u32, 'B' as u32), -4.0);
    assert_eq!(font.kerning('B' as u32, 'A' as u32), 0.0);
}

#[test]
fn pixels_per_point_scales_every_metric() {
    let font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 2.0).unwrap();
    assert_eq!(font.metrics().line_height, 16.0);
    assert_eq!(font.metrics().base, 12.0);
    let a = font.glyph('A' as u32).unwrap();
    assert_eq!(a.x_advance, 5.0);
    assert_eq!(a.width, 4.0);
    assert_eq!(font.kerning('A' as u32, 'B' as u32), -2.0);
}

#[test]
fn owning_pages_computes_uvs() {
    let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    font.initialize_with_pages(vec![page_image()]).unwrap();
    assert_eq!(font.state(), FontState::InitializedOwnsPages);
    assert_eq!(font.pages().unwrap().len(), 1);

    let b = font.glyph('B' as u32).unwrap();
    assert_eq!(b.u, 8.0 / 32.0);
    assert_eq!(b.u2, 16.0 / 32.0);
    assert_eq!(b.v, 0.0);
    assert_eq!(b.v2, 12.0 / 32.0);
    // The zero-area space has no graphic.
    assert_eq!(font.glyph(' ' as u32).unwrap().page, -1);
}

#[test]
fn page_count_mismatch_is_an_error() {
    let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    assert!(matches!(
        font.initialize_with_pages(Vec::new()),
        Err(FontError::PageCountMismatch {
            declared: 1,
            supplied: 0
        })
    ));
}

#[test]
fn packer_initialization_borrows_pages() {
    let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    let mut packer = ImagePacker::new(64, 64, 1);
    font.initialize_into_packer(&mut packer, &[page_image()])
        .unwrap();
    assert_eq!(font.state(), FontState::InitializedBorrowsPages);
    assert!(font.pages().unwrap().is_empty());
    assert_eq!(packer.pages().len(), 1);

    let a = font.glyph('A' as u32).unwrap();
    assert!(a.page >= 0);
    assert!(a.u2 > a.u);
}

#[test]
fn initialize_twice_is_an_invalid_state() {
    let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    font.initialize_with_pages(vec![page_image()]).unwrap();
    assert!(matches!(
        font.initialize_with_pages(vec![page_image()]),
        Err(FontError::InvalidState { .. })
    ));
}

#[test]
fn disposed_font_refuses_page_access() {
    let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
    font.initialize_with_pages(vec![page_image()]).unwrap();
    font.dispose();
    assert!(font.is_disposed());
    assert!(font.pages().is_err());
}

#[test]
fn fallback_chain_resolves_missing_glyphs() {
    let fallback = {
        let mut font = BitmapFont::from_descriptor("demo", DESCRIPTOR, 1.0).unwrap();
        font.initialize_with_pages(vec![page_image()]).unwrap();
        Arc::new(font)
    };
    let descriptor_without_b = "common lineHeight=32 base=24\n\
         char id=65 x=0 y=0 width=8 height=12 xoffset=1 yoffset=10 xadvance=10 page=0\n";
    let mut thin = BitmapFont::from_descriptor("thin", descriptor_without_b, 1.0).unwrap();
    thin.set_fallback(Some(fallback));

    assert!(thin.glyph('A' as u32).is_some());
    // B comes from the fallback.
    assert_eq!(thin.glyph('B' as u32).map(|g| g.id), Some('B' as u32));
    assert!(thin.glyph('Z' as u32).is_none());
}

#[test]
fn malformed_descriptor_reports_the_line() {
    let err = BitmapFont::from_descriptor("bad", "common lineHeight=16 base=twelve\n", 1.0)
        .unwrap_err();
    assert!(matches!(err, FontError::Malformed { line: 1, .. }));
}
