//! Missing-glyph handling
//!
//! When a font has no glyph for a code point, the outcome is a pure function
//! of the code point: spaces advance the pen by a table-driven fraction of an
//! em, default-ignorable code points vanish with zero width, and everything
//! else shows the font's missing-glyph graphic.

/// Outcome of a glyph miss.
///
/// * positive `w`: advance the pen by `space_x_advance * w / 8`, emit no
///   glyph, reset kerning memory;
/// * `0`: consume the character with zero width;
/// * `-1`: show the font's id-0 "tofu" glyph.
pub fn missing_glyph_width(c: char) -> i8 {
    if let Some(width) = space_width_eighths(c) {
        return width;
    }
    if is_zero_width_ignorable(c) {
        return 0;
    }
    -1
}

/// Width of the Unicode space family in eighths of the font's space advance.
fn space_width_eighths(c: char) -> Option<i8> {
    Some(match c {
        '\u{0020}' | '\u{00A0}' => 8, // space, no-break space
        '\u{2000}' | '\u{2002}' => 16, // en quad, en space
        '\u{2001}' | '\u{2003}' => 32, // em quad, em space
        '\u{2004}' => 11,             // three-per-em space
        '\u{2005}' => 8,              // four-per-em space
        '\u{2006}' => 5,              // six-per-em space
        '\u{2007}' => 8,              // figure space
        '\u{2008}' => 4,              // punctuation space
        '\u{2009}' => 4,              // thin space
        '\u{200A}' => 3,              // hair space
        '\u{202F}' => 4,              // narrow no-break space
        '\u{205F}' => 7,              // medium mathematical space
        '\u{3000}' => 32,             // ideographic space
        _ => return None,
    })
}

/// Default-ignorable code points that disappear with zero width, minus the
/// characters the layout handles itself (`\n`, `\t`), the interlinear
/// annotation block, and format characters that are conventionally given a
/// visible fallback.
fn is_zero_width_ignorable(c: char) -> bool {
    if matches!(c, '\n' | '\t') {
        return false;
    }
    // Visible-Cf exceptions: Arabic/Syriac prefixed format marks.
    if matches!(c, '\u{0600}'..='\u{0605}' | '\u{06DD}' | '\u{070F}' | '\u{08E2}' | '\u{110BD}') {
        return false;
    }
    // Interlinear annotation anchors render as tofu, not as nothing.
    if matches!(c, '\u{FFF9}'..='\u{FFFB}') {
        return false;
    }
    matches!(c,
        '\u{00AD}'                      // soft hyphen
        | '\u{034F}'                    // combining grapheme joiner
        | '\u{061C}'                    // Arabic letter mark
        | '\u{115F}'..='\u{1160}'       // Hangul fillers
        | '\u{17B4}'..='\u{17B5}'
        | '\u{180B}'..='\u{180F}'       // Mongolian selectors + vowel separator
        | '\u{200B}'..='\u{200F}'       // zero-width spaces and marks
        | '\u{202A}'..='\u{202E}'       // embedding controls
        | '\u{2060}'..='\u{206F}'       // word joiner, invisible operators
        | '\u{3164}'                    // Hangul filler
        | '\u{FE00}'..='\u{FE0F}'       // variation selectors
        | '\u{FEFF}'                    // zero-width no-break space
        | '\u{FFA0}'
        | '\u{FFF0}'..='\u{FFF8}'
        | '\u{1BCA0}'..='\u{1BCA3}'     // shorthand format controls
        | '\u{1D173}'..='\u{1D17A}'     // musical beams and slurs
        | '\u{E0000}'..='\u{E0FFF}'     // tags and variation selectors
    )
}
