//! Line-break point search
//!
//! Given the character the width budget landed on, pick the byte where the
//! line actually breaks. Without a locale the search is a backward scan for
//! ASCII whitespace; with a locale the candidate boundaries come from the
//! Unicode line-breaking algorithm (UAX #14).

use unicode_linebreak::linebreaks;

/// ASCII space; the only character collapsed at wrap boundaries.
pub(crate) const COLLAPSIBLE_SPACE: u8 = b' ';

/// Find the break byte for a line spanning `[line_start, line_end)` whose
/// width budget ran out at `hit`.
///
/// `breaks` is reusable scratch for the UAX #14 path.
pub(crate) fn find_wrap_point(
    source: &str,
    locale: Option<&str>,
    line_start: usize,
    line_end: usize,
    hit: usize,
    breaks: &mut Vec<usize>,
) -> usize {
    if locale.is_some() {
        find_wrap_point_uax14(source, line_start, line_end, hit, breaks)
    } else {
        find_wrap_point_ascii(source, line_start, hit)
    }
}

/// Backward scan for ASCII whitespace; the wrap point is the first byte of
/// the whitespace run so every consecutive space collapses together. No
/// whitespace in range forces a break exactly at `hit`.
fn find_wrap_point_ascii(source: &str, line_start: usize, hit: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = hit.min(bytes.len().saturating_sub(1));
    while i > line_start {
        if matches!(bytes[i], COLLAPSIBLE_SPACE | b'\t') {
            // Back up over the whole whitespace run.
            let mut first = i;
            while first > line_start && matches!(bytes[first - 1], COLLAPSIBLE_SPACE | b'\t') {
                first -= 1;
            }
            return first;
        }
        i -= 1;
    }
    hit
}

/// UAX #14 path: break at `hit` when it is itself a boundary or is followed
/// only by collapsible spaces up to the next boundary; otherwise at the
/// preceding boundary, falling back to `hit` when that would empty the line.
fn find_wrap_point_uax14(
    source: &str,
    line_start: usize,
    line_end: usize,
    hit: usize,
    breaks: &mut Vec<usize>,
) -> usize {
    let line = &source[line_start..line_end];
    breaks.clear();
    breaks.extend(
        linebreaks(line)
            .map(|(pos, _)| line_start + pos)
            .filter(|&pos| pos > line_start && pos < line_end),
    );

    if breaks.binary_search(&hit).is_ok() {
        return hit;
    }
    let next = breaks.partition_point(|&b| b < hit);
    let next_boundary = breaks.get(next).copied().unwrap_or(line_end);
    if source.as_bytes()[hit..next_boundary]
        .iter()
        .all(|&b| b == COLLAPSIBLE_SPACE)
        && hit < next_boundary
    {
        return hit;
    }
    match next.checked_sub(1).and_then(|i| breaks.get(i)) {
        Some(&preceding) if preceding > line_start => preceding,
        _ => hit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_scan_backs_up_to_whitespace() {
        let text = "alpha beta";
        let mut scratch = Vec::new();
        // Budget ran out on 'e' of "beta".
        assert_eq!(find_wrap_point(text, None, 0, text.len(), 7, &mut scratch), 5);
    }

    #[test]
    fn ascii_scan_collapses_whole_space_run() {
        let text = "a   b";
        let mut scratch = Vec::new();
        assert_eq!(find_wrap_point(text, None, 0, text.len(), 4, &mut scratch), 1);
    }

    #[test]
    fn no_whitespace_forces_break_at_hit() {
        let text = "abcdef";
        let mut scratch = Vec::new();
        assert_eq!(find_wrap_point(text, None, 0, text.len(), 3, &mut scratch), 3);
    }

    #[test]
    fn uax14_uses_preceding_boundary() {
        let text = "alpha beta";
        let mut scratch = Vec::new();
        // 'e' of "beta"; the preceding UAX #14 boundary is the start of
        // "beta" (after the space).
        assert_eq!(
            find_wrap_point(text, Some("en"), 0, text.len(), 8, &mut scratch),
            6
        );
    }

    #[test]
    fn uax14_falls_back_to_hit_at_line_start() {
        let text = "unbreakable";
        let mut scratch = Vec::new();
        assert_eq!(
            find_wrap_point(text, Some("en"), 0, text.len(), 4, &mut scratch),
            4
        );
    }
}
