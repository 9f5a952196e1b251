//! Per-thread layout context and glyph-run pool
//!
//! Steady-state layout must not allocate: finished runs return to a pool and
//! the engine's scratch buffers live in a [`LayoutContext`]. One context
//! belongs to exactly one renderer thread; the crate provides a
//! `thread_local!` default so simple callers never see it.

use std::cell::RefCell;
use std::sync::Arc;

use unicode_bidi::Level;

use crate::font::BitmapFont;
use crate::layout::run::{GlyphRun, RunFlags};
use crate::types::{Color, Rect};

/// Soft cap on pooled runs; beyond it, freed runs are dropped.
const POOL_SOFT_MAX: usize = 256;

/// Scratch state shared by every layout pass on one thread.
pub struct LayoutContext {
    free_runs: Vec<GlyphRun>,
    /// Per-line BiDi reorder scratch.
    pub(crate) levels: Vec<Level>,
    pub(crate) visual_order: Vec<usize>,
    /// Line-break opportunity scratch for the wrap search.
    pub(crate) break_opportunities: Vec<usize>,
    /// Reusable selection-rectangle buffer.
    pub(crate) selection_rects: Vec<Rect>,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self {
            free_runs: Vec::new(),
            levels: Vec::new(),
            visual_order: Vec::new(),
            break_opportunities: Vec::new(),
            selection_rects: Vec::new(),
        }
    }

    /// Take a cleared run from the pool, configured for the given style.
    pub(crate) fn obtain_run(
        &mut self,
        font: &Arc<BitmapFont>,
        color: Color,
        line: usize,
        level: Level,
        flags: RunFlags,
    ) -> GlyphRun {
        let mut run = match self.free_runs.pop() {
            Some(mut run) => {
                run.reset();
                run
            }
            None => GlyphRun::new(font.clone()),
        };
        run.font = font.clone();
        run.color = color;
        run.line = line;
        run.level = level;
        run.flags = flags;
        run
    }

    /// Return a run to the pool. Arrays keep their capacity; the checkpoint
    /// array is released.
    pub(crate) fn free_run(&mut self, mut run: GlyphRun) {
        if self.free_runs.len() < POOL_SOFT_MAX {
            run.reset();
            self.free_runs.push(run);
        }
    }

    pub(crate) fn free_runs(&mut self, runs: impl IntoIterator<Item = GlyphRun>) {
        for run in runs {
            self.free_run(run);
        }
    }

    /// Number of runs currently pooled.
    pub fn pooled_runs(&self) -> usize {
        self.free_runs.len()
    }
}

impl Default for LayoutContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CONTEXT: RefCell<LayoutContext> = RefCell::new(LayoutContext::new());
}

/// Run `f` with this thread's default layout context.
pub fn with_context<F, R>(f: F) -> R
where
    F: FnOnce(&mut LayoutContext) -> R,
{
    CONTEXT.with(|context| f(&mut context.borrow_mut()))
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

    #[test]
    fn freed_runs_are_reused_with_cleared_state() {
        let mut context = LayoutContext::new();
        let font = test_font();
        let mut run = context.obtain_run(&font, 7, 3, Level::rtl(), RunFlags::TAB);
        run.glyph_x.push(1.0);
        run.character_positions.push(2.0);
        run.width = 9.0;
        context.free_run(run);
        assert_eq!(context.pooled_runs(), 1);

        let run = context.obtain_run(&font, 0, 0, Level::ltr(), RunFlags::empty());
        assert_eq!(context.pooled_runs(), 0);
        assert!(run.glyph_x.is_empty());
        assert!(run.character_positions.is_empty());
        assert_eq!(run.width, 0.0);
        assert!(run.flags.is_empty());
    }
}
