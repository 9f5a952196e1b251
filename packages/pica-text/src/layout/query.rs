//! Caret, hit-test and selection queries over a completed layout
//!
//! All queries run on the inverse index built at the end of `layout()`: a
//! sorted array of 32-bit words packing `(chars_start << 15) | run_index`
//! for every non-ellipsis run. A character lookup binary-searches with the
//! probe `(index << 15) | 0x7FFF`, landing on the run with the greatest
//! start at or before the character.

use std::ops::Range;

use super::pool::LayoutContext;
use super::run::RunFlags;
use super::Layout;
use crate::types::{HorizontalAlign, Rect};

const RUN_MASK: u32 = 0x7FFF;
const START_LIMIT: u32 = 0x1FFFF;

impl Layout {
    /// Index of the run rendering byte `char_index`.
    ///
    /// When the byte is not covered (beyond the truncated prefix, or the
    /// layout is empty), `closest` selects the nearest run instead of
    /// answering `None`.
    pub fn run_index_of(&self, char_index: usize, closest: bool) -> Option<usize> {
        let words = self.index_words();
        if words.is_empty() {
            return None;
        }
        let probe = ((char_index as u32).min(START_LIMIT) << 15) | RUN_MASK;
        let at = words.partition_point(|&w| w <= probe);
        if at == 0 {
            return closest.then(|| (words[0] & RUN_MASK) as usize);
        }
        let candidate = (words[at - 1] & RUN_MASK) as usize;
        if self.runs()[candidate].contains_char(char_index) || closest {
            Some(candidate)
        } else {
            None
        }
    }

    /// Line index at vertical offset `y` (layout-internal coordinates, Y
    /// growing downward), clamped to the existing lines.
    pub fn line_at(&self, y: f32) -> usize {
        let heights = self.line_heights();
        let line = heights.partition_point(|&h| h <= y);
        line.min(heights.len().saturating_sub(1))
    }

    /// Top Y of a line.
    pub fn line_top(&self, line: usize) -> f32 {
        if line == 0 {
            0.0
        } else {
            self.line_heights()
                .get(line - 1)
                .copied()
                .unwrap_or_else(|| self.height())
        }
    }

    /// Height of a line.
    pub fn line_height(&self, line: usize) -> f32 {
        let top = self.line_top(line);
        self.line_heights()
            .get(line)
            .copied()
            .unwrap_or_else(|| self.height())
            - top
    }

    /// Runs of one line, in visual order.
    pub fn line_runs(&self, line: usize) -> &[super::GlyphRun] {
        let runs = self.runs();
        let start = runs.partition_point(|r| r.line < line);
        let end = runs.partition_point(|r| r.line <= line);
        &runs[start..end]
    }

    /// Byte index of the character under the point `(x, y)`.
    ///
    /// With `closest`, a point outside any run still answers the nearest
    /// character; without it, misses answer `None`.
    pub fn index_at(&self, x: f32, y: f32, closest: bool) -> Option<usize> {
        if self.index_words().is_empty() {
            return None;
        }
        let line = self.line_at(y);
        let line_runs = self.line_runs(line);
        let mut chosen: Option<&super::GlyphRun> = None;
        for run in line_runs {
            if run.flags.contains(RunFlags::ELLIPSIS) {
                continue;
            }
            // Half-open on the right so a point exactly on a run seam
            // resolves to the run whose content starts there.
            if run.x <= x && x < run.x + run.width {
                chosen = Some(run);
                break;
            }
        }
        if chosen.is_none() {
            if !closest {
                return None;
            }
            // Rightmost run starting at or left of the point, else the
            // leftmost run of the line.
            let mut candidates = line_runs
                .iter()
                .filter(|r| !r.flags.contains(RunFlags::ELLIPSIS));
            chosen = candidates
                .clone()
                .filter(|r| r.x <= x)
                .last()
                .or_else(|| candidates.next());
        }
        let Some(run) = chosen else {
            // An empty trailing line: the caret belongs at the end of the
            // covered text.
            return Some(self.covered_end());
        };

        let local = x - run.x;
        let mut best_index = run.chars_start;
        let mut best_distance = f32::INFINITY;
        for (i, &pos) in run.character_positions.iter().enumerate() {
            if pos.is_nan() {
                continue;
            }
            let distance = (pos - local).abs();
            // Ties go to the later index in LTR and the earlier in RTL.
            let better = if run.is_ltr() {
                distance <= best_distance
            } else {
                distance < best_distance
            };
            if better {
                best_distance = distance;
                best_index = run.chars_start + i;
            }
        }

        if run.flags.contains(RunFlags::LINEBREAK) {
            // Keep the caret on the visible line instead of the terminator.
            return Some(self.prev_boundary(best_index));
        }
        Some(best_index)
    }

    /// Caret rectangle (zero width, line height) at the leading edge of the
    /// grapheme at `index`. Out-of-range indices clamp to the first or last
    /// run.
    pub fn caret_position(&self, index: usize) -> Rect {
        let Some(run_index) = self.run_index_of(index, true) else {
            // No runs at all: a single empty line positioned by alignment.
            return Rect::new(self.empty_line_x(), 0.0, 0.0, self.line_height(0));
        };
        let run = &self.runs()[run_index];

        if run.flags.contains(RunFlags::LINEBREAK) && index >= run.chars_end {
            // The caret after a terminator sits at the start of the next
            // line, respecting alignment.
            let line = run.line + 1;
            if line < self.line_count() {
                let x = self
                    .line_runs(line)
                    .iter()
                    .map(|r| r.x)
                    .fold(f32::INFINITY, f32::min);
                let x = if x.is_finite() { x } else { self.empty_line_x() };
                return Rect::new(x, self.line_top(line), 0.0, self.line_height(line));
            }
        }

        let local = if index >= run.chars_end {
            if run.is_ltr() {
                run.width
            } else {
                0.0
            }
        } else if index < run.chars_start {
            if run.is_ltr() {
                0.0
            } else {
                run.width
            }
        } else {
            run.position_of(index)
        };
        Rect::new(
            run.x + local,
            self.line_top(run.line),
            0.0,
            self.line_height(run.line),
        )
    }

    /// Move a caret by `delta` grapheme clusters, skipping continuation
    /// bytes and ellipsis runs, clamping at the document ends.
    pub fn index_after_edit_offset(&self, index: usize, delta: isize) -> usize {
        let mut current = index.min(self.covered_end());
        if delta >= 0 {
            for _ in 0..delta {
                current = self.next_boundary(current);
            }
        } else {
            for _ in 0..-delta {
                current = self.prev_boundary(current);
            }
        }
        current
    }

    /// Byte range removed by a delete (`forward`) or backspace at `index`:
    /// one grapheme cluster, clamped at the document ends.
    pub fn deletion_range(&self, index: usize, forward: bool) -> Range<usize> {
        let index = index.min(self.covered_end());
        if forward {
            index..self.index_after_edit_offset(index, 1)
        } else {
            self.index_after_edit_offset(index, -1)..index
        }
    }

    /// Selection rectangles for the byte range `[start, end)`: one rectangle
    /// per visually contiguous span on each line, merged when adjacent. The
    /// buffer comes from the context's rectangle pool and is valid until the
    /// next query through the same context.
    pub fn selection_rects<'c>(
        &self,
        context: &'c mut LayoutContext,
        start: usize,
        end: usize,
    ) -> &'c [Rect] {
        context.selection_rects.clear();
        if start >= end {
            return &context.selection_rects;
        }
        for run in self.runs() {
            if run.flags.contains(RunFlags::ELLIPSIS) {
                continue;
            }
            let from = start.max(run.chars_start);
            let to = end.min(run.chars_end);
            if from >= to {
                continue;
            }
            let (local_left, local_right) = if run.is_ltr() {
                let left = run.position_of(from);
                let right = if to >= run.chars_end {
                    run.width
                } else {
                    run.position_of(to)
                };
                (left, right)
            } else {
                let right = run.position_of(from);
                let left = if to >= run.chars_end {
                    0.0
                } else {
                    run.position_of(to)
                };
                (left, right)
            };
            if local_right <= local_left {
                continue;
            }
            let rect = Rect::new(
                run.x + local_left,
                self.line_top(run.line),
                local_right - local_left,
                self.line_height(run.line),
            );
            // Merge with an adjacent rectangle on the same line.
            if let Some(last) = context.selection_rects.last_mut() {
                if last.y == rect.y && (last.x + last.width - rect.x).abs() < 1e-3 {
                    last.width += rect.width;
                    continue;
                }
            }
            context.selection_rects.push(rect);
        }
        &context.selection_rects
    }

    /// Leading-edge X of an empty line under the configured alignment.
    fn empty_line_x(&self) -> f32 {
        match self.align() {
            HorizontalAlign::Left => 0.0,
            HorizontalAlign::Center => self.align_width() / 2.0,
            HorizontalAlign::Right => self.align_width(),
        }
    }

    /// Next grapheme boundary after `index` within the covered prefix.
    fn next_boundary(&self, index: usize) -> usize {
        let covered = self.covered_end();
        if index >= covered {
            return covered;
        }
        let mut run_index = match self.run_index_of(index, true) {
            Some(i) => i,
            None => return covered,
        };
        loop {
            let run = &self.runs()[run_index];
            // First finite boundary strictly after `index`.
            let from = if index >= run.chars_start {
                index - run.chars_start + 1
            } else {
                0
            };
            for (i, &pos) in run.character_positions.iter().enumerate().skip(from) {
                if !pos.is_nan() {
                    return run.chars_start + i;
                }
            }
            if run.chars_end >= covered {
                return covered;
            }
            run_index = match self.run_index_of(run.chars_end, false) {
                Some(i) => i,
                None => return covered,
            };
        }
    }

    /// Previous grapheme boundary strictly before `index`.
    fn prev_boundary(&self, index: usize) -> usize {
        if index == 0 {
            return 0;
        }
        let mut probe = index - 1;
        loop {
            let Some(run_index) = self.run_index_of(probe, true) else {
                return 0;
            };
            let run = &self.runs()[run_index];
            let upto = probe.min(run.chars_end - 1) - run.chars_start;
            for i in (0..=upto).rev() {
                if !run.character_positions[i].is_nan() {
                    let candidate = run.chars_start + i;
                    if candidate < index {
                        return candidate;
                    }
                }
            }
            if run.chars_start == 0 {
                return 0;
            }
            probe = run.chars_start - 1;
        }
    }
}
