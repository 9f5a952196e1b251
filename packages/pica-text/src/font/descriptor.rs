//! Bitmap font descriptor parser
//!
//! Line-oriented ASCII/UTF-8 format with space-separated `key=value` tokens:
//!
//! ```text
//! info ...                                   (ignored)
//! common lineHeight=<int> base=<int> [pages=<int>] ...
//! page id=<int> file="<path>"                (one per page)
//! char id=<int> x=<int> y=<int> width=<int> height=<int> \
//!      xoffset=<int> yoffset=<int> xadvance=<int> page=<int>
//! kerning first=<int> second=<int> amount=<int>
//! ```
//!
//! Pixel-valued fields are divided by `pixels_per_point` at load; the raw
//! source rectangles are kept in texture pixels for page binding.

use log::{debug, warn};

use crate::error::FontError;

pub(crate) const MAX_CHAR_ID: u32 = 0x10FFFF;

/// One `char` line, metrics still in descriptor pixels.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawChar {
    pub id: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub x_offset: i32,
    pub y_offset: i32,
    pub x_advance: i32,
    pub page: u32,
}

/// Parsed descriptor: line metrics, page files, chars and kerning pairs.
#[derive(Debug, Clone, Default)]
pub(crate) struct Descriptor {
    pub line_height: i32,
    pub base: i32,
    pub pages: Vec<String>,
    pub chars: Vec<RawChar>,
    pub kernings: Vec<(u32, u32, i32)>,
}

struct Tokens<'a> {
    line: &'a str,
    line_no: usize,
}

impl<'a> Tokens<'a> {
    fn get(&self, key: &str) -> Option<&'a str> {
        for token in self.line.split_ascii_whitespace() {
            if let Some(value) = token.strip_prefix(key) {
                if let Some(value) = value.strip_prefix('=') {
                    return Some(value.trim_matches('"'));
                }
            }
        }
        None
    }

    fn int(&self, key: &str) -> Result<i64, FontError> {
        let value = self.get(key).ok_or_else(|| FontError::Malformed {
            line: self.line_no,
            reason: format!("missing {key}"),
        })?;
        value.parse().map_err(|_| FontError::Malformed {
            line: self.line_no,
            reason: format!("{key} is not an integer: {value:?}"),
        })
    }

    fn uint(&self, key: &str) -> Result<u32, FontError> {
        let value = self.int(key)?;
        u32::try_from(value).map_err(|_| FontError::Malformed {
            line: self.line_no,
            reason: format!("{key} is negative: {value}"),
        })
    }
}

pub(crate) fn parse(text: &str) -> Result<Descriptor, FontError> {
    let mut descriptor = Descriptor::default();
    let mut seen_common = false;

    for (index, raw_line) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let tokens = Tokens { line, line_no };
        let Some(keyword) = line.split_ascii_whitespace().next() else {
            continue;
        };
        match keyword {
            "info" | "chars" | "kernings" => {}
            "common" => {
                descriptor.line_height = tokens.int("lineHeight")? as i32;
                descriptor.base = tokens.int("base")? as i32;
                seen_common = true;
            }
            "page" => {
                let id = tokens.uint("id")? as usize;
                if id != descriptor.pages.len() {
                    return Err(FontError::PageOutOfSequence {
                        expected: descriptor.pages.len(),
                        found: id,
                    });
                }
                let file = tokens.get("file").ok_or_else(|| FontError::Malformed {
                    line: line_no,
                    reason: "page without file".into(),
                })?;
                descriptor.pages.push(file.to_owned());
            }
            "char" => {
                let id = tokens.uint("id")?;
                if id > MAX_CHAR_ID {
                    return Err(FontError::Malformed {
                        line: line_no,
                        reason: format!("char id {id:#x} beyond U+10FFFF"),
                    });
                }
                if descriptor.chars.iter().any(|c| c.id == id) {
                    warn!("duplicate char id {id:#x} at line {line_no}, dropped");
                    continue;
                }
                descriptor.chars.push(RawChar {
                    id,
                    x: tokens.uint("x")?,
                    y: tokens.uint("y")?,
                    width: tokens.uint("width")?,
                    height: tokens.uint("height")?,
                    x_offset: tokens.int("xoffset")? as i32,
                    y_offset: tokens.int("yoffset")? as i32,
                    x_advance: tokens.int("xadvance")? as i32,
                    page: tokens.uint("page")?,
                });
            }
            "kerning" => {
                let first = tokens.uint("first")?;
                let second = tokens.uint("second")?;
                let amount = tokens.int("amount")? as i32;
                if descriptor
                    .kernings
                    .iter()
                    .any(|&(f, s, _)| f == first && s == second)
                {
                    warn!("duplicate kerning pair {first:#x}/{second:#x} at line {line_no}, dropped");
                    continue;
                }
                descriptor.kernings.push((first, second, amount));
            }
            other => {
                return Err(FontError::Malformed {
                    line: line_no,
                    reason: format!("unrecognized section {other:?}"),
                });
            }
        }
    }

    if !seen_common {
        return Err(FontError::Malformed {
            line: 0,
            reason: "no common line".into(),
        });
    }
    for ch in &descriptor.chars {
        if ch.page as usize >= descriptor.pages.len().max(1) {
            return Err(FontError::Malformed {
                line: 0,
                reason: format!("char {:#x} references missing page {}", ch.id, ch.page),
            });
        }
    }

    debug!(
        "parsed font descriptor: {} glyphs, {} kerning pairs, {} pages",
        descriptor.chars.len(),
        descriptor.kernings.len(),
        descriptor.pages.len()
    );
    Ok(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
info face="test" size=16
common lineHeight=16 base=12 pages=1
page id=0 file="page0.png"
char id=65 x=0 y=0 width=8 height=10 xoffset=1 yoffset=2 xadvance=10 page=0
char id=66 x=8 y=0 width=8 height=10 xoffset=1 yoffset=2 xadvance=10 page=0
kerning first=65 second=66 amount=-2
"#;

    #[test]
    fn parses_all_sections() {
        let d = parse(SAMPLE).unwrap();
        assert_eq!(d.line_height, 16);
        assert_eq!(d.base, 12);
        assert_eq!(d.pages, ["page0.png"]);
        assert_eq!(d.chars.len(), 2);
        assert_eq!(d.kernings, [(65, 66, -2)]);
    }

    #[test]
    fn duplicate_chars_drop_later_entries() {
        let text = "common lineHeight=16 base=12\n\
                    char id=65 x=0 y=0 width=1 height=1 xoffset=0 yoffset=0 xadvance=5 page=0\n\
                    char id=65 x=9 y=9 width=9 height=9 xoffset=9 yoffset=9 xadvance=9 page=0\n";
        let d = parse(text).unwrap();
        assert_eq!(d.chars.len(), 1);
        assert_eq!(d.chars[0].x_advance, 5);
    }

    #[test]
    fn out_of_sequence_page_is_an_error() {
        let text = "common lineHeight=16 base=12\npage id=1 file=\"a.png\"\n";
        assert!(matches!(
            parse(text),
            Err(FontError::PageOutOfSequence {
                expected: 0,
                found: 1
            })
        ));
    }

    #[test]
    fn missing_field_is_malformed() {
        let text = "common lineHeight=16\n";
        assert!(matches!(parse(text), Err(FontError::Malformed { .. })));
    }
}
