//! Paragraph layout engine
//!
//! Turns a [`StyledText`] into positioned [`GlyphRun`]s in five passes over
//! one synchronous call:
//!
//! 1. shape segments into runs in logical order, kerning and collapsing as
//!    it goes;
//! 2. soft-wrap lines against the width budget with word-aware break search;
//! 3. complete each line: BiDi visual reorder, X reflow, vertical metrics;
//! 4. ellipsize when the height or line budget clamps the text;
//! 5. align lines horizontally and build the character inverse index.
//!
//! The call never suspends and never fails on data: missing glyphs and
//! unknown code points are handled per `missing`, and the only surfaced
//! errors are API-boundary ones.

pub mod missing;
pub mod pool;
pub mod query;
pub mod run;
pub(crate) mod wrap;

use std::sync::Arc;

use log::trace;
use smallvec::SmallVec;
use unicode_bidi::Level;
use unicode_segmentation::UnicodeSegmentation;

use crate::error::LayoutError;
use crate::font::{BitmapFont, Glyph, GlyphFlags};
use crate::segment::{SegmentFlags, TextRunSegmenter};
use crate::style::StyledText;
use crate::types::{HorizontalAlign, LayoutOptions};
pub use pool::{with_context, LayoutContext};
pub use run::{GlyphRun, RunFlags};

use missing::missing_glyph_width;
use run::Checkpoint;

/// A laid-out paragraph: ordered glyph runs, cumulative line heights and the
/// inverse index backing caret and hit-test queries.
///
/// The instance is reusable; every [`layout`](Self::layout) call replaces the
/// previous content, returning spent runs to the context's pool.
#[derive(Default)]
pub struct Layout {
    runs: Vec<GlyphRun>,
    /// `line_heights[k]` is the height of lines `0..=k` together.
    line_heights: Vec<f32>,
    width: f32,
    align_width: f32,
    align: HorizontalAlign,
    truncated: bool,
    /// Sorted `(chars_start << 15) | run_index` words for non-ellipsis runs.
    index: Vec<u32>,
    /// End of the covered source prefix.
    covered_end: usize,
}

impl Layout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lay `text` out with this thread's default context.
    pub fn layout(&mut self, text: &StyledText, options: &LayoutOptions) -> Result<(), LayoutError> {
        with_context(|context| self.layout_in(context, text, options))
    }

    /// Lay `text` out using an explicit per-thread context.
    pub fn layout_in(
        &mut self,
        context: &mut LayoutContext,
        text: &StyledText,
        options: &LayoutOptions,
    ) -> Result<(), LayoutError> {
        self.clear_in(context);
        if text.initial_font().is_disposed()
            || text.regions().iter().any(|r| r.font.is_disposed())
        {
            return Err(LayoutError::Disposed);
        }

        let mut engine = Engine {
            context,
            text,
            source: text.text(),
            available_width: options.width_limit(),
            max_lines: options.height.max_lines(),
            max_height: options.height.max_height(),
            runs: std::mem::take(&mut self.runs),
            line_heights: std::mem::take(&mut self.line_heights),
            start_x: 0.0,
            line: 0,
            line_first_run: 0,
            line_char_start: 0,
            paragraph_level: Level::ltr(),
            pending_kern: None,
            clamp_pending: false,
            last_valid_line: 0,
        };
        engine.run(options);

        self.runs = std::mem::take(&mut engine.runs);
        self.line_heights = std::mem::take(&mut engine.line_heights);
        self.truncated = engine.clamp_pending;
        self.align = options.align;
        self.finish_alignment(options);
        self.build_index();
        trace!(
            "layout: {} runs on {} lines, width {}, covered {} bytes",
            self.runs.len(),
            self.line_heights.len(),
            self.width,
            self.covered_end
        );
        Ok(())
    }

    /// Drop all content, returning runs to the pool.
    pub fn clear_in(&mut self, context: &mut LayoutContext) {
        context.free_runs(self.runs.drain(..));
        self.line_heights.clear();
        self.index.clear();
        self.width = 0.0;
        self.align_width = 0.0;
        self.truncated = false;
        self.covered_end = 0;
    }

    /// Runs in final order: by line, then by visual X.
    #[inline]
    pub fn runs(&self) -> &[GlyphRun] {
        &self.runs
    }

    /// Cumulative line heights; `line_heights()[k]` covers lines `0..=k`.
    #[inline]
    pub fn line_heights(&self) -> &[f32] {
        &self.line_heights
    }

    #[inline]
    pub fn line_count(&self) -> usize {
        self.line_heights.len()
    }

    /// Total paragraph height.
    #[inline]
    pub fn height(&self) -> f32 {
        self.line_heights.last().copied().unwrap_or(0.0)
    }

    /// Observable paragraph width under the configured alignment.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// Width lines were aligned within; equals `width()` under left
    /// alignment.
    #[inline]
    pub fn align_width(&self) -> f32 {
        self.align_width
    }

    #[inline]
    pub fn align(&self) -> HorizontalAlign {
        self.align
    }

    /// Whether the vertical budget clipped the text.
    #[inline]
    pub fn truncated(&self) -> bool {
        self.truncated
    }

    /// End of the source prefix covered by non-ellipsis runs.
    #[inline]
    pub fn covered_end(&self) -> usize {
        self.covered_end
    }

    pub(crate) fn index_words(&self) -> &[u32] {
        &self.index
    }

    /// Compute the paragraph width and shift lines for center/right
    /// alignment.
    fn finish_alignment(&mut self, options: &LayoutOptions) {
        let raw_width = self
            .runs
            .iter()
            .map(|r| r.x + r.draw_width())
            .fold(0.0f32, f32::max);

        match options.align {
            HorizontalAlign::Left => {
                self.width = raw_width;
                self.align_width = raw_width;
            }
            align => {
                let align_to = if options.available_width > 0.0 {
                    options.available_width
                } else {
                    raw_width
                };
                let mut i = 0;
                while i < self.runs.len() {
                    let line = self.runs[i].line;
                    let mut end = i;
                    let mut line_width = 0.0f32;
                    while end < self.runs.len() && self.runs[end].line == line {
                        line_width = line_width.max(self.runs[end].x + self.runs[end].draw_width());
                        end += 1;
                    }
                    let mut offset = align_to - line_width;
                    if align == HorizontalAlign::Center {
                        offset /= 2.0;
                    }
                    if offset > 0.0 {
                        for run in &mut self.runs[i..end] {
                            run.x += offset;
                        }
                    }
                    i = end;
                }
                self.align_width = align_to;
                self.width = match align {
                    HorizontalAlign::Right => align_to,
                    _ => (align_to + raw_width) / 2.0,
                };
            }
        }
    }

    /// Build the sorted packed inverse index over non-ellipsis runs.
    fn build_index(&mut self) {
        self.index.clear();
        self.covered_end = 0;
        for (i, run) in self.runs.iter().enumerate() {
            if run.flags.contains(RunFlags::ELLIPSIS) {
                continue;
            }
            self.covered_end = self.covered_end.max(run.chars_end);
            let start = (run.chars_start as u32).min(0x1FFFF);
            let index = (i as u32).min(0x7FFE);
            self.index.push((start << 15) | index);
        }
        self.index.sort_unstable();
    }
}

/// Kerning carryover from the previously appended run on the same line.
struct PendingKern {
    font: Arc<BitmapFont>,
    level: Level,
    glyph: u32,
}

/// Working state of one layout pass.
struct Engine<'a> {
    context: &'a mut LayoutContext,
    text: &'a StyledText,
    source: &'a str,
    available_width: f32,
    max_lines: usize,
    max_height: f32,
    runs: Vec<GlyphRun>,
    line_heights: Vec<f32>,
    /// Current pen X on the open line.
    start_x: f32,
    /// Index of the open line.
    line: usize,
    /// First run of the open line.
    line_first_run: usize,
    /// Logical byte where the open line starts.
    line_char_start: usize,
    paragraph_level: Level,
    pending_kern: Option<PendingKern>,
    clamp_pending: bool,
    last_valid_line: usize,
}

impl Engine<'_> {
    fn run(&mut self, options: &LayoutOptions) {
        let segmenter = TextRunSegmenter::new(self.text);
        self.paragraph_level = segmenter.paragraph_level();

        for segment in segmenter {
            if self.clamp_pending {
                break;
            }
            if segment.flags.contains(SegmentFlags::LINEBREAK) {
                self.append_linebreak(&segment);
            } else if segment.flags.contains(SegmentFlags::TAB) {
                self.append_tab(&segment);
                self.check_overflow();
            } else {
                self.append_text(&segment);
                self.check_overflow();
            }
        }
        if !self.clamp_pending {
            self.complete_line();
            self.check_closed_line_budget(false);
        }
        if self.clamp_pending {
            self.ellipsize(options);
        }
    }

    // ---- segment shaping -------------------------------------------------

    fn append_linebreak(&mut self, segment: &crate::segment::Segment) {
        let mut run = self.context.obtain_run(
            &segment.font,
            segment.color,
            self.line,
            self.paragraph_level,
            RunFlags::LINEBREAK,
        );
        run.x = self.start_x;
        run.chars_start = segment.start;
        run.chars_end = segment.end;
        run.character_positions.push(0.0);
        for _ in segment.start + 1..segment.end {
            run.character_positions.push(f32::NAN);
        }
        self.runs.push(run);
        self.pending_kern = None;
        self.complete_line();
        self.line_char_start = segment.end;
        self.check_closed_line_budget(true);
    }

    fn append_tab(&mut self, segment: &crate::segment::Segment) {
        let default_advance = 8.0 * segment.font.metrics().space_x_advance;
        let mut run = self.context.obtain_run(
            &segment.font,
            segment.color,
            self.line,
            self.paragraph_level,
            RunFlags::TAB,
        );
        run.x = self.start_x;
        run.chars_start = segment.start;
        run.chars_end = segment.end;
        run.character_positions.push(0.0);
        if let Some(stop) = self
            .text
            .tab_stop_index_for(self.start_x, default_advance)
            .map(|i| self.text.tab_stop_offset_for(i, default_advance))
        {
            if stop > self.start_x {
                run.width = stop - self.start_x;
                self.start_x = stop;
            }
        }
        self.runs.push(run);
        self.pending_kern = None;
    }

    fn append_text(&mut self, segment: &crate::segment::Segment) {
        let kern_from = match &self.pending_kern {
            Some(pending)
                if pending.level == segment.level
                    && Arc::ptr_eq(&pending.font, &segment.font) =>
            {
                Some(pending.glyph)
            }
            _ => None,
        };
        let mut run = self.context.obtain_run(
            &segment.font,
            segment.color,
            self.line,
            segment.level,
            RunFlags::empty(),
        );
        run.x = self.start_x;
        run.chars_start = segment.start;
        run.chars_end = segment.end;
        synthesize_run(&mut run, self.source, kern_from, true);
        self.start_x += run.width;
        self.remember_kern(&run);
        self.runs.push(run);
    }

    fn remember_kern(&mut self, run: &GlyphRun) {
        self.pending_kern = if run.flags.contains(RunFlags::KERN_TO_LAST_GLYPH) {
            run.glyphs.last().map(|g| PendingKern {
                font: run.font.clone(),
                level: run.level,
                glyph: g.id,
            })
        } else {
            None
        };
    }

    // ---- soft wrapping ---------------------------------------------------

    fn check_overflow(&mut self) {
        while self.start_x >= self.available_width && !self.clamp_pending {
            if !self.wrap_once() {
                break;
            }
        }
    }

    /// Resolve one overflow. Answers `false` when the line cannot be wrapped
    /// further and the overflow must stand.
    fn wrap_once(&mut self) -> bool {
        let line_end = self
            .runs
            .last()
            .map(|r| r.chars_end)
            .unwrap_or(self.line_char_start);

        let Some(hit) = self.find_overflow_char() else {
            return false;
        };

        let mut wrap = wrap::find_wrap_point(
            self.source,
            self.text.locale(),
            self.line_char_start,
            line_end,
            hit,
            &mut self.context.break_opportunities,
        );
        if wrap <= self.line_char_start {
            // Force progress: keep at least one cluster on the line.
            wrap = hit.max(next_grapheme_boundary(self.source, self.line_char_start));
        }
        let real_wrap = skip_collapsible(self.source, wrap, line_end);

        self.collapse_spaces(wrap, real_wrap);

        if real_wrap >= line_end {
            // Only trailing spaces overflowed; the line keeps them collapsed
            // and the pen retreats to the wrap point.
            self.start_x = self.line_content_end();
            return false;
        }

        // Split out everything from real_wrap onward.
        let moved = self.split_line_at(wrap, real_wrap);
        self.complete_line();
        self.line_char_start = real_wrap;
        self.check_closed_line_budget(true);
        if self.clamp_pending {
            self.context.free_runs(moved);
            return true;
        }
        self.relayout_moved(moved);
        true
    }

    /// Locate the byte whose glyph no longer fits the width budget.
    fn find_overflow_char(&self) -> Option<usize> {
        for run in &self.runs[self.line_first_run..] {
            if run.x + run.width < self.available_width || run.char_len() == 0 {
                continue;
            }
            let local_limit = self.available_width - run.x;
            if run.is_ltr() {
                // First char whose leading (left) edge is past the budget.
                for (i, &pos) in run.character_positions.iter().enumerate() {
                    if !pos.is_nan() && pos >= local_limit {
                        return Some(run.chars_start + i);
                    }
                }
            } else {
                // The logical prefix occupies the right side of the run; a
                // char fits while its left edge stays inside the window that
                // the budget keeps visible.
                let window_left = run.width - local_limit;
                let mut prev: Option<usize> = None;
                for (i, &pos) in run.character_positions.iter().enumerate() {
                    if pos.is_nan() {
                        continue;
                    }
                    // `pos` is the right edge of char i, which is the left
                    // edge of the previous logical char.
                    if let Some(prev_index) = prev {
                        if pos < window_left {
                            return Some(run.chars_start + prev_index);
                        }
                    }
                    prev = Some(i);
                }
                if let Some(prev_index) = prev {
                    if 0.0 < window_left {
                        return Some(run.chars_start + prev_index);
                    }
                }
            }
        }
        None
    }

    /// Collapse the spaces in `[wrap, real_wrap)` in place: their positions
    /// all become the wrap-point X and host widths truncate to it.
    fn collapse_spaces(&mut self, wrap: usize, real_wrap: usize) {
        if wrap >= real_wrap {
            return;
        }
        for run in &mut self.runs[self.line_first_run..] {
            let from = wrap.max(run.chars_start);
            let to = real_wrap.min(run.chars_end);
            if from >= to {
                continue;
            }
            let collapse_x = if run.chars_start >= wrap {
                // The run begins inside the collapse zone.
                0.0
            } else if run.is_ltr() {
                run.position_of(wrap)
            } else {
                0.0
            };
            for byte in from..to {
                run.character_positions[byte - run.chars_start] = collapse_x;
            }
            if run.is_ltr() {
                run.width = run.width.min(collapse_x);
            }
        }
    }

    /// Detach all line content from `real_wrap` onward, splitting the run
    /// containing it when the boundary falls inside one. The collapsed
    /// spaces in `[wrap, real_wrap)` stay with the closed line.
    fn split_line_at(&mut self, wrap: usize, real_wrap: usize) -> Vec<GlyphRun> {
        // First run whose content reaches past the boundary.
        let mut split_index = self.runs.len();
        for (i, run) in self.runs.iter().enumerate().skip(self.line_first_run) {
            if run.chars_end > real_wrap {
                split_index = i;
                break;
            }
        }
        if split_index == self.runs.len() {
            return Vec::new();
        }

        let splits_inside = self.runs[split_index].chars_start < real_wrap;
        let mut moved: Vec<GlyphRun> = Vec::new();
        if splits_inside {
            let host = &self.runs[split_index];
            let tail_end = host.chars_end;
            let (font, color, level) = (host.font.clone(), host.color, host.level);
            let mut part2 =
                self.context
                    .obtain_run(&font, color, self.line, level, RunFlags::empty());
            part2.chars_start = real_wrap;
            part2.chars_end = tail_end;
            moved.push(part2);
            truncate_run(&mut self.runs[split_index], wrap, real_wrap, self.source);
            moved.extend(self.runs.split_off(split_index + 1));
        } else {
            moved = self.runs.split_off(split_index);
        }
        moved
    }

    /// Re-lay detached runs at the start of the fresh line.
    fn relayout_moved(&mut self, moved: Vec<GlyphRun>) {
        self.pending_kern = None;
        for mut run in moved {
            run.line = self.line;
            run.x = self.start_x;
            if run.flags.contains(RunFlags::TAB) {
                run.width = 0.0;
                let default_advance = 8.0 * run.font.metrics().space_x_advance;
                if let Some(stop) = self
                    .text
                    .tab_stop_index_for(self.start_x, default_advance)
                    .map(|i| self.text.tab_stop_offset_for(i, default_advance))
                {
                    if stop > self.start_x {
                        run.width = stop - self.start_x;
                    }
                }
                self.start_x += run.width;
                self.pending_kern = None;
            } else {
                let kern_from = match &self.pending_kern {
                    Some(pending)
                        if pending.level == run.level && Arc::ptr_eq(&pending.font, &run.font) =>
                    {
                        Some(pending.glyph)
                    }
                    _ => None,
                };
                synthesize_run(&mut run, self.source, kern_from, true);
                self.start_x += run.width;
                self.remember_kern(&run);
            }
            self.runs.push(run);
        }
    }

    fn line_content_end(&self) -> f32 {
        self.runs[self.line_first_run..]
            .iter()
            .map(|r| r.x + r.width)
            .fold(0.0f32, f32::max)
    }

    // ---- line completion -------------------------------------------------

    fn complete_line(&mut self) {
        self.finish_line(true);
    }

    /// Close the open line: visual reorder (skipped when re-finishing an
    /// already reordered line), X reflow, vertical metrics and baseline Y.
    fn finish_line(&mut self, reorder: bool) {
        let first = self.line_first_run;
        let count = self.runs.len() - first;

        // Visual reorder.
        if reorder && count > 1 {
            self.context.levels.clear();
            self.context
                .levels
                .extend(self.runs[first..].iter().map(|r| r.level));
            let levels = &self.context.levels;
            if levels.iter().all(|l| l.is_rtl()) {
                self.runs[first..].reverse();
            } else if !levels.iter().all(|l| l.is_ltr()) {
                let order = reorder_visual(levels);
                let line_runs = self.runs.split_off(first);
                let mut slots: Vec<Option<GlyphRun>> = line_runs.into_iter().map(Some).collect();
                for &logical in &order {
                    if let Some(run) = slots[logical].take() {
                        self.runs.push(run);
                    }
                }
            }
        }

        // Reflow X left to right.
        let mut pen = 0.0f32;
        for run in &mut self.runs[first..] {
            run.x = pen;
            pen += run.width;
        }

        // Vertical metrics: fonts with glyphs win; glyph-less runs only
        // contribute when nothing else is present.
        let mut fonts: SmallVec<[&Arc<BitmapFont>; 4]> = SmallVec::new();
        for run in &self.runs[first..] {
            if !run.glyphs.is_empty() && !fonts.iter().any(|f| Arc::ptr_eq(f, &run.font)) {
                fonts.push(&run.font);
            }
        }
        if fonts.is_empty() {
            for run in &self.runs[first..] {
                if !fonts.iter().any(|f| Arc::ptr_eq(f, &run.font)) {
                    fonts.push(&run.font);
                }
            }
        }
        let initial = self.text.initial_font();
        if fonts.is_empty() {
            fonts.push(initial);
        }
        let top_to_baseline = fonts
            .iter()
            .map(|f| f.metrics().base)
            .fold(0.0f32, f32::max);
        let baseline_to_down = fonts
            .iter()
            .map(|f| f.metrics().line_height - f.metrics().base)
            .fold(0.0f32, f32::max);
        let line_height = top_to_baseline + baseline_to_down;
        drop(fonts);

        let above = self.line_heights.last().copied().unwrap_or(0.0);
        for run in &mut self.runs[first..] {
            run.y = above - top_to_baseline + run.font.metrics().base;
        }
        self.line_heights.push(above + line_height);

        self.line += 1;
        self.line_first_run = self.runs.len();
        self.start_x = 0.0;
        self.pending_kern = None;
    }

    /// After closing a line, clamp against the vertical budget. The closed
    /// line index is `self.line - 1`.
    fn check_closed_line_budget(&mut self, more_content: bool) {
        let closed = self.line - 1;
        let cumulative = self.line_heights.last().copied().unwrap_or(0.0);
        if cumulative > self.max_height && closed > 0 {
            // The just-closed line itself exceeds the budget: undo it.
            let keep = self
                .runs
                .iter()
                .position(|r| r.line == closed)
                .unwrap_or(self.runs.len());
            let dropped = self.runs.split_off(keep);
            self.context.free_runs(dropped);
            self.line_heights.pop();
            self.line = closed;
            self.line_first_run = self.runs.len();
            self.last_valid_line = closed - 1;
            self.clamp_pending = true;
        } else if more_content && self.line >= self.max_lines {
            self.last_valid_line = closed;
            self.clamp_pending = true;
        }
    }

    // ---- ellipsis truncation ---------------------------------------------

    fn ellipsize(&mut self, options: &LayoutOptions) {
        let line = self.last_valid_line;
        // Drop any linebreak run left on the surviving line.
        let mut i = self.runs.len();
        while i > 0 {
            i -= 1;
            if self.runs[i].line == line && self.runs[i].flags.contains(RunFlags::LINEBREAK) {
                let run = self.runs.remove(i);
                self.context.free_run(run);
            }
        }
        let first = self
            .runs
            .iter()
            .position(|r| r.line == line)
            .unwrap_or(self.runs.len());

        let Some(ellipsis) = options.ellipsis.as_deref().filter(|e| !e.is_empty()) else {
            return;
        };
        let covered_end = self.runs.iter().map(|r| r.chars_end).max().unwrap_or(0);

        let initial_font = self.text.initial_font().clone();
        let mut marker = self.context.obtain_run(
            &initial_font,
            self.text.initial_color(),
            line,
            self.paragraph_level,
            RunFlags::ELLIPSIS,
        );
        marker.chars_start = 0;
        marker.chars_end = ellipsis.len();
        synthesize_run(&mut marker, ellipsis, None, false);
        marker.chars_start = covered_end;
        marker.chars_end = covered_end;
        marker.character_positions.clear();
        marker.checkpoints = None;
        let marker_width = marker.width;

        let content_end = self.runs[first..]
            .iter()
            .map(|r| r.x + r.width)
            .fold(0.0f32, f32::max);

        if content_end + marker_width > self.available_width {
            let target = self.available_width - marker_width;
            // Peel runs off the visual right until the marker fits.
            while self.runs.len() > first {
                let last_index = self.runs.len() - 1;
                let last = &self.runs[last_index];
                if last.x >= target {
                    let run = self.runs.remove(last_index);
                    self.context.free_run(run);
                    continue;
                }
                let local_target = target - last.x;
                if last.width <= local_target {
                    break;
                }
                match char_end_for_target_width(last, local_target) {
                    Some(new_end) => {
                        let run = &mut self.runs[last_index];
                        run.chars_end = new_end;
                        synthesize_run(run, self.source, None, false);
                        break;
                    }
                    None => {
                        let run = self.runs.remove(last_index);
                        self.context.free_run(run);
                    }
                }
            }
        }

        // The reflow below assigns the marker its final X after the kept
        // content.
        self.runs.push(marker);

        // Re-finish the line in its existing visual order: reflow X and
        // recompute vertical metrics with the marker included.
        self.line_first_run = first;
        self.line = line;
        if self.line_heights.len() > line {
            self.line_heights.truncate(line);
        }
        self.finish_line(false);
    }
}

// ---- glyph synthesis ------------------------------------------------------

/// Fill a run's glyphs and character positions from `source` over the run's
/// byte range, in logical order, returning with `width` set to the final pen.
///
/// For left-to-right runs the leading edge recorded per grapheme cluster is
/// the pen before the cluster; for right-to-left runs (laid out back to
/// front) it is the pen after the cluster, which is the cluster's right edge.
fn synthesize_run(run: &mut GlyphRun, source: &str, kern_from: Option<u32>, checkpoints: bool) {
    let range = run.chars_start..run.chars_end;
    let slice = &source[range];
    run.glyphs.clear();
    run.glyph_x.clear();
    run.glyph_y.clear();
    run.character_positions.clear();
    run.character_positions.resize(slice.len(), f32::NAN);
    run.checkpoints = None;
    run.flags.remove(RunFlags::KERN_TO_LAST_GLYPH);

    let rtl = !run.is_ltr();
    let mut pen = 0.0f32;
    let mut kern = kern_from;

    if rtl {
        for (offset, cluster) in slice.grapheme_indices(true).rev() {
            for ch in cluster.chars() {
                place_char(run, ch, rtl, &mut pen, &mut kern);
            }
            run.character_positions[offset] = pen;
        }
    } else {
        for (offset, cluster) in slice.grapheme_indices(true) {
            if checkpoints {
                run.push_checkpoint(run.chars_start + offset, run.glyphs.len());
            }
            run.character_positions[offset] = pen;
            for ch in cluster.chars() {
                place_char(run, ch, rtl, &mut pen, &mut kern);
            }
        }
    }

    run.width = pen;
    if kern.is_some() {
        run.flags.insert(RunFlags::KERN_TO_LAST_GLYPH);
    }
}

fn place_char(run: &mut GlyphRun, ch: char, rtl: bool, pen: &mut f32, kern: &mut Option<u32>) {
    let metrics = run.font.metrics();
    if ch == ' ' {
        // Collapsible space: advances the pen, never emits a glyph, and
        // resets kerning memory so wrap-time collapse stays exact.
        *pen += metrics.space_x_advance;
        *kern = None;
        return;
    }

    let mut flags = GlyphFlags::empty();
    let mut found: Option<Glyph> = None;
    if rtl {
        if let Some(mirrored) = mirror_pair(ch) {
            match run.font.glyph(mirrored as u32) {
                Some(glyph) => found = Some(*glyph),
                None => {
                    if let Some(glyph) = run.font.glyph(ch as u32) {
                        found = Some(*glyph);
                        flags |= GlyphFlags::MIRRORED;
                    }
                }
            }
        }
    }
    if found.is_none() {
        found = run.font.glyph(ch as u32).copied();
    }

    match found {
        Some(mut glyph) => {
            glyph.flags |= flags;
            emit_glyph(run, glyph, pen, kern);
        }
        None => match missing_glyph_width(ch) {
            -1 => {
                if let Some(tofu) = run.font.glyph(0).copied() {
                    emit_glyph(run, tofu, pen, kern);
                }
            }
            0 => {}
            width => {
                *pen += metrics.space_x_advance * width as f32 / 8.0;
                *kern = None;
            }
        },
    }
}

fn emit_glyph(run: &mut GlyphRun, glyph: Glyph, pen: &mut f32, kern: &mut Option<u32>) {
    if let Some(previous) = *kern {
        *pen += run.font.kerning(previous, glyph.id);
    }
    run.glyph_x.push(*pen);
    run.glyph_y.push(-run.font.metrics().base);
    *pen += glyph.x_advance;
    *kern = Some(glyph.id);
    run.glyphs.push(glyph);
}

/// Truncate a run at the wrap boundary, keeping the collapsed spaces in
/// `[wrap, real_wrap)` as zero-width trailing positions.
fn truncate_run(run: &mut GlyphRun, wrap: usize, real_wrap: usize, source: &str) {
    if run.is_ltr() {
        if let Some(glyph_count) = run.checkpoint_glyphs_before(wrap) {
            run.glyphs.truncate(glyph_count);
            run.glyph_x.truncate(glyph_count);
            run.glyph_y.truncate(glyph_count);
            let collapse_x = run.position_of(wrap.max(run.chars_start));
            run.character_positions
                .truncate(real_wrap - run.chars_start);
            run.chars_end = real_wrap;
            run.width = run.width.min(collapse_x);
            if let Some(checkpoints) = run.checkpoints.as_mut() {
                checkpoints.retain(|c: &Checkpoint| c.byte < wrap);
            }
            run.flags.remove(RunFlags::KERN_TO_LAST_GLYPH);
            return;
        }
    }
    // Right-to-left (or checkpoint-less) runs re-synthesize the kept prefix
    // and append the collapsed trailing spaces by hand.
    let old_end = run.chars_end;
    run.chars_end = wrap.max(run.chars_start);
    synthesize_run(run, source, None, false);
    let collapse_x = if run.is_ltr() { run.width } else { 0.0 };
    for _ in run.chars_end..real_wrap.min(old_end) {
        run.character_positions.push(collapse_x);
    }
    run.chars_end = real_wrap.min(old_end);
}

/// Largest boundary in the run whose prefix still fits `target` width, used
/// by the ellipsis pass. `None` means not even one cluster fits.
fn char_end_for_target_width(run: &GlyphRun, target: f32) -> Option<usize> {
    let mut best: Option<usize> = None;
    if run.is_ltr() {
        for (i, &pos) in run.character_positions.iter().enumerate() {
            if pos.is_nan() {
                continue;
            }
            if i > 0 && pos <= target {
                best = Some(run.chars_start + i);
            }
        }
    } else {
        let window = run.width - target;
        for (i, &pos) in run.character_positions.iter().enumerate() {
            if pos.is_nan() {
                continue;
            }
            if i > 0 && pos >= window {
                best = Some(run.chars_start + i);
            }
        }
    }
    best
}

/// UAX #9 rule L2: map resolved levels to visual order. Returns logical run
/// indices in visual order.
fn reorder_visual(levels: &[Level]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..levels.len()).collect();
    let max_level = levels.iter().map(|l| l.number()).max().unwrap_or(0);
    let min_odd = levels
        .iter()
        .map(|l| l.number())
        .filter(|n| n % 2 == 1)
        .min()
        .unwrap_or(max_level + 1);
    let mut level = max_level;
    while level >= min_odd && level > 0 {
        let mut i = 0;
        while i < order.len() {
            if levels[order[i]].number() >= level {
                let start = i;
                while i < order.len() && levels[order[i]].number() >= level {
                    i += 1;
                }
                order[start..i].reverse();
            } else {
                i += 1;
            }
        }
        level -= 1;
    }
    order
}

/// Byte offset of the grapheme boundary after `index`.
fn next_grapheme_boundary(source: &str, index: usize) -> usize {
    source[index..]
        .grapheme_indices(true)
        .nth(1)
        .map(|(offset, _)| index + offset)
        .unwrap_or(source.len())
}

/// Skip collapsible spaces forward from `from`, bounded by `end`.
fn skip_collapsible(source: &str, from: usize, end: usize) -> usize {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < end && bytes[i] == wrap::COLLAPSIBLE_SPACE {
        i += 1;
    }
    i
}

/// Paired-bracket mirror for right-to-left runs.
fn mirror_pair(c: char) -> Option<char> {
    Some(match c {
        '(' => ')',
        ')' => '(',
        '[' => ']',
        ']' => '[',
        '{' => '}',
        '}' => '{',
        '<' => '>',
        '>' => '<',
        '\u{00AB}' => '\u{00BB}',
        '\u{00BB}' => '\u{00AB}',
        '\u{2039}' => '\u{203A}',
        '\u{203A}' => '\u{2039}',
        '\u{2329}' => '\u{232A}',
        '\u{232A}' => '\u{2329}',
        _ => return None,
    })
}
