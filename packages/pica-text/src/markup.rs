//! Markup language parser
//!
//! Tags of the form `[element,element,...]` switch font and color inside a
//! string; `[[` escapes a literal `[` and the empty tag `[]` pops the style
//! stack. Elements are hex colors (`#RGB`, `#RGBA`, `#RRGGBB`, `#RRGGBBAA`,
//! alpha defaulting to `0xFF`), registered color names, registered font
//! names, registered aliases (expanded recursively), `-` (reset to the
//! initial style) and `!` (clear the stack and reset). All elements of one
//! tag accumulate into a single push. Invalid tags render as literal text.

use std::sync::Arc;

use ahash::AHashMap;

use crate::font::BitmapFont;
use crate::style::StyledText;
use crate::types::Color;

const MAX_ALIAS_DEPTH: usize = 64;

/// Registry-backed parser turning markup into a [`StyledText`].
pub struct MarkupParser {
    fonts: AHashMap<String, Arc<BitmapFont>>,
    colors: AHashMap<String, Color>,
    aliases: AHashMap<String, String>,
}

impl MarkupParser {
    /// A parser with the standard color names pre-registered.
    pub fn new() -> Self {
        let mut colors = AHashMap::new();
        for (name, color) in [
            ("white", 0xFFFFFFFFu32),
            ("black", 0x000000FF),
            ("red", 0xFF0000FF),
            ("green", 0x00FF00FF),
            ("blue", 0x0000FFFF),
            ("yellow", 0xFFFF00FF),
            ("orange", 0xFFA500FF),
            ("cyan", 0x00FFFFFF),
            ("magenta", 0xFF00FFFF),
            ("gray", 0x7F7F7FFF),
            ("lightgray", 0xBFBFBFFF),
            ("darkgray", 0x3F3F3FFF),
        ] {
            colors.insert(name.to_owned(), color);
        }
        Self {
            fonts: AHashMap::new(),
            colors,
            aliases: AHashMap::new(),
        }
    }

    pub fn register_font(&mut self, name: impl Into<String>, font: Arc<BitmapFont>) {
        self.fonts.insert(name.into(), font);
    }

    pub fn register_color(&mut self, name: impl Into<String>, color: Color) {
        self.colors.insert(name.into(), color);
    }

    /// Register `name` as shorthand for a comma-separated element list.
    /// Cyclic aliases are a caller error; expansion stops at a fixed depth
    /// and renders the tag literally.
    pub fn register_alias(&mut self, name: impl Into<String>, elements: impl Into<String>) {
        self.aliases.insert(name.into(), elements.into());
    }

    /// Parse `markup` into plain text plus style regions.
    pub fn parse(
        &self,
        markup: &str,
        initial_font: &Arc<BitmapFont>,
        initial_color: Color,
    ) -> StyledText {
        let mut plain = String::with_capacity(markup.len());
        let mut regions: Vec<(usize, Arc<BitmapFont>, Color)> = Vec::new();
        let mut stack: Vec<(Arc<BitmapFont>, Color)> = Vec::new();
        let initial = (initial_font.clone(), initial_color);

        let bytes = markup.as_bytes();
        let mut i = 0;
        while i < markup.len() {
            if bytes[i] != b'[' {
                let ch = markup[i..].chars().next().unwrap_or('\u{FFFD}');
                plain.push(ch);
                i += ch.len_utf8();
                continue;
            }
            if bytes.get(i + 1) == Some(&b'[') {
                plain.push('[');
                i += 2;
                continue;
            }
            let Some(close) = markup[i + 1..].find(']').map(|c| i + 1 + c) else {
                plain.push('[');
                i += 1;
                continue;
            };
            let tag = &markup[i + 1..close];
            if tag.is_empty() {
                // Pop back to the enclosing style.
                stack.pop();
                let (font, color) = stack.last().unwrap_or(&initial);
                regions.push((plain.len(), font.clone(), *color));
                i = close + 1;
                continue;
            }

            let current = stack.last().unwrap_or(&initial).clone();
            match self.apply_tag(tag, &current, &initial) {
                Some((style, clear_stack)) => {
                    if clear_stack {
                        stack.clear();
                    }
                    regions.push((plain.len(), style.0.clone(), style.1));
                    stack.push(style);
                    i = close + 1;
                }
                None => {
                    // Invalid tag: the bracket renders literally and the tag
                    // body is scanned again as plain text.
                    plain.push('[');
                    i += 1;
                }
            }
        }

        let mut text = StyledText::new(plain, initial_font.clone(), initial_color);
        for (start, font, color) in regions {
            if start < text.len() {
                // A duplicate start overwrites, which is exactly the
                // "last tag at this position wins" rule.
                let _ = text.add_region(start, font, color);
            }
        }
        text
    }

    /// Evaluate every element of a tag into one accumulated style push.
    /// Answers the new style and whether `!` asked for a stack clear.
    fn apply_tag(
        &self,
        tag: &str,
        current: &(Arc<BitmapFont>, Color),
        initial: &(Arc<BitmapFont>, Color),
    ) -> Option<((Arc<BitmapFont>, Color), bool)> {
        let mut style = current.clone();
        let mut clear_stack = false;
        for element in tag.split(',') {
            if !self.apply_element(element.trim(), &mut style, &mut clear_stack, initial, 0) {
                return None;
            }
        }
        Some((style, clear_stack))
    }

    fn apply_element(
        &self,
        element: &str,
        style: &mut (Arc<BitmapFont>, Color),
        clear_stack: &mut bool,
        initial: &(Arc<BitmapFont>, Color),
        depth: usize,
    ) -> bool {
        if depth > MAX_ALIAS_DEPTH || element.is_empty() {
            return false;
        }
        match element {
            "-" => {
                *style = initial.clone();
                return true;
            }
            "!" => {
                *clear_stack = true;
                *style = initial.clone();
                return true;
            }
            _ => {}
        }
        if let Some(hex) = element.strip_prefix('#') {
            return match parse_hex_color(hex) {
                Some(color) => {
                    style.1 = color;
                    true
                }
                None => false,
            };
        }
        if let Some(expansion) = self.aliases.get(element) {
            for nested in expansion.split(',') {
                if !self.apply_element(nested.trim(), style, clear_stack, initial, depth + 1) {
                    return false;
                }
            }
            return true;
        }
        if let Some(&color) = self.colors.get(element) {
            style.1 = color;
            return true;
        }
        if let Some(font) = self.fonts.get(element) {
            style.0 = font.clone();
            return true;
        }
        false
    }
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self::new()
    }
}

/// `RGB`, `RGBA`, `RRGGBB` or `RRGGBBAA` hex digits into packed RGBA; alpha
/// defaults to opaque.
fn parse_hex_color(hex: &str) -> Option<Color> {
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let wide = |pair: &str| u32::from_str_radix(pair, 16).ok();
    let narrow = |nibble: &str| u32::from_str_radix(nibble, 16).ok().map(|v| v * 17);
    let (r, g, b, a) = match hex.len() {
        3 => (
            narrow(&hex[0..1])?,
            narrow(&hex[1..2])?,
            narrow(&hex[2..3])?,
            0xFF,
        ),
        4 => (
            narrow(&hex[0..1])?,
            narrow(&hex[1..2])?,
            narrow(&hex[2..3])?,
            narrow(&hex[3..4])?,
        ),
        6 => (wide(&hex[0..2])?, wide(&hex[2..4])?, wide(&hex[4..6])?, 0xFF),
        8 => (
            wide(&hex[0..2])?,
            wide(&hex[2..4])?,
            wide(&hex[4..6])?,
            wide(&hex[6..8])?,
        ),
        _ => return None,
    };
    Some((r << 24) | (g << 16) | (b << 8) | a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{BitmapFont, KerningTable, LineMetrics};

    fn test_font(name: &str) -> Arc<BitmapFont> {
        Arc::new(BitmapFont::from_parts(
            name,
            LineMetrics {
                line_height: 16.0,
                base: 12.0,
                space_x_advance: 10.0,
            },
            Vec::new(),
            KerningTable::default(),
        ))
    }

    const WHITE: Color = 0xFFFFFFFF;

    #[test]
    fn hex_colors_parse_with_default_alpha() {
        assert_eq!(parse_hex_color("F00"), Some(0xFF0000FF));
        assert_eq!(parse_hex_color("F00A"), Some(0xFF0000AA));
        assert_eq!(parse_hex_color("12345"), None);
        assert_eq!(parse_hex_color("123456"), Some(0x123456FF));
        assert_eq!(parse_hex_color("12345678"), Some(0x12345678));
        assert_eq!(parse_hex_color("xyz"), None);
    }

    #[test]
    fn color_tag_opens_a_region() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("ab[red]cd", &font, WHITE);
        assert_eq!(text.text(), "abcd");
        assert_eq!(text.color_at(0), WHITE);
        assert_eq!(text.color_at(2), 0xFF0000FF);
    }

    #[test]
    fn pop_restores_the_previous_style() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("a[red]b[]c", &font, WHITE);
        assert_eq!(text.text(), "abc");
        assert_eq!(text.color_at(1), 0xFF0000FF);
        assert_eq!(text.color_at(2), WHITE);
    }

    #[test]
    fn escaped_bracket_is_literal() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("a[[b", &font, WHITE);
        assert_eq!(text.text(), "a[b");
    }

    #[test]
    fn invalid_tag_renders_literally() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("a[nope]b", &font, WHITE);
        assert_eq!(text.text(), "a[nope]b");
        assert!(text.regions().is_empty());
    }

    #[test]
    fn font_and_color_accumulate_into_one_push() {
        let mut parser = MarkupParser::new();
        let base = test_font("base");
        let bold = test_font("bold");
        parser.register_font("bold", bold.clone());
        let text = parser.parse("x[bold,red]y[]z", &base, WHITE);
        assert_eq!(text.text(), "xyz");
        assert!(Arc::ptr_eq(text.font_at(1), &bold));
        assert_eq!(text.color_at(1), 0xFF0000FF);
        // One pop restores both.
        assert!(Arc::ptr_eq(text.font_at(2), &base));
        assert_eq!(text.color_at(2), WHITE);
    }

    #[test]
    fn aliases_expand_recursively() {
        let mut parser = MarkupParser::new();
        let base = test_font("base");
        parser.register_alias("warn", "yellow");
        parser.register_alias("alert", "warn");
        let text = parser.parse("[alert]x", &base, WHITE);
        assert_eq!(text.color_at(0), 0xFFFF00FF);
    }

    #[test]
    fn cyclic_alias_renders_literally() {
        let mut parser = MarkupParser::new();
        let base = test_font("base");
        parser.register_alias("a", "b");
        parser.register_alias("b", "a");
        let text = parser.parse("[a]x", &base, WHITE);
        assert_eq!(text.text(), "[a]x");
    }

    #[test]
    fn reset_returns_to_initial_style() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("[red]a[-]b", &font, WHITE);
        assert_eq!(text.color_at(0), 0xFF0000FF);
        assert_eq!(text.color_at(1), WHITE);
    }

    #[test]
    fn clear_resets_the_whole_stack() {
        let parser = MarkupParser::new();
        let font = test_font("base");
        let text = parser.parse("[red][blue]a[!]b[]c", &font, WHITE);
        assert_eq!(text.color_at(1), WHITE);
        // The pop after `!` has nothing left to revert past the reset.
        assert_eq!(text.color_at(2), WHITE);
    }
}
