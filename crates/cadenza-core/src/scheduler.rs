//! Sub-block scheduling: interleave audio rendering with discrete events.
//!
//! A block of `L` frames with events at offsets `t1 < t2 < ... < tk` is
//! rendered as `[0, t1)`, then the events at `t1` are applied, then
//! `[t1, t2)`, and so on up to `[tk, L)`. Each event therefore affects audio
//! from its own frame onward and never earlier.
//!
//! ```text
//!  0        t1          t2              L
//!  |--------|-----------|---------------|
//!   render  ^  render   ^    render
//!           apply       apply
//! ```

use std::ops::Range;

/// Receiver of rendered spans and applied events.
pub trait BlockRenderer<E> {
    /// Render audio for `range` (block-relative frames, never empty).
    fn render(&mut self, range: Range<usize>);

    /// Apply an event at the current cursor.
    fn apply(&mut self, event: E);
}

/// Splits one block into causally ordered sub-ranges.
///
/// Feed events in offset order with [`event`](Self::event), then call
/// [`finish`](Self::finish) to render the tail.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    block_len: usize,
    cursor: usize,
    applied: usize,
    deferred: usize,
}

impl FrameScheduler {
    pub fn new(block_len: usize) -> Self {
        Self {
            block_len,
            cursor: 0,
            applied: 0,
            deferred: 0,
        }
    }

    /// Render up to `offset` and apply `event` there.
    ///
    /// Offsets at or beyond the block length are not applied. An offset
    /// behind the cursor is clamped forward to it.
    #[inline]
    pub fn event<E, R>(&mut self, offset: usize, event: E, renderer: &mut R)
    where
        R: BlockRenderer<E> + ?Sized,
    {
        if offset >= self.block_len {
            self.deferred += 1;
            return;
        }
        let at = offset.max(self.cursor);
        if at > self.cursor {
            renderer.render(self.cursor..at);
            self.cursor = at;
        }
        renderer.apply(event);
        self.applied += 1;
    }

    /// Render the remainder of the block.
    #[inline]
    pub fn finish<E, R>(&mut self, renderer: &mut R)
    where
        R: BlockRenderer<E> + ?Sized,
    {
        if self.cursor < self.block_len {
            renderer.render(self.cursor..self.block_len);
            self.cursor = self.block_len;
        }
    }

    /// Schedule a whole block at once.
    pub fn run<E, I, R>(block_len: usize, events: I, renderer: &mut R) -> Self
    where
        I: IntoIterator<Item = (usize, E)>,
        R: BlockRenderer<E> + ?Sized,
    {
        let mut scheduler = Self::new(block_len);
        for (offset, event) in events {
            scheduler.event(offset, event, renderer);
        }
        scheduler.finish(renderer);
        scheduler
    }

    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Events applied so far.
    #[inline]
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Events skipped because they fall past the block.
    #[inline]
    pub fn deferred(&self) -> usize {
        self.deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Step {
        Render(Range<usize>),
        Apply(u32),
    }

    #[derive(Default)]
    struct Recorder {
        steps: Vec<Step>,
    }

    impl BlockRenderer<u32> for Recorder {
        fn render(&mut self, range: Range<usize>) {
            self.steps.push(Step::Render(range));
        }

        fn apply(&mut self, event: u32) {
            self.steps.push(Step::Apply(event));
        }
    }

    #[test]
    fn test_no_events_renders_whole_block() {
        let mut recorder = Recorder::default();
        FrameScheduler::run(64, std::iter::empty::<(usize, u32)>(), &mut recorder);
        assert_eq!(recorder.steps, vec![Step::Render(0..64)]);
    }

    #[test]
    fn test_events_split_block() {
        let mut recorder = Recorder::default();
        let scheduler = FrameScheduler::run(64, [(10, 1), (40, 2)], &mut recorder);
        assert_eq!(
            recorder.steps,
            vec![
                Step::Render(0..10),
                Step::Apply(1),
                Step::Render(10..40),
                Step::Apply(2),
                Step::Render(40..64),
            ]
        );
        assert_eq!(scheduler.applied(), 2);
    }

    #[test]
    fn test_zero_length_ranges_skipped() {
        let mut recorder = Recorder::default();
        FrameScheduler::run(32, [(0, 1), (16, 2), (16, 3)], &mut recorder);
        assert_eq!(
            recorder.steps,
            vec![
                Step::Apply(1),
                Step::Render(0..16),
                Step::Apply(2),
                Step::Apply(3),
                Step::Render(16..32),
            ]
        );
    }

    #[test]
    fn test_offset_past_block_not_applied() {
        let mut recorder = Recorder::default();
        let scheduler = FrameScheduler::run(32, [(8, 1), (32, 2), (100, 3)], &mut recorder);
        assert_eq!(
            recorder.steps,
            vec![Step::Render(0..8), Step::Apply(1), Step::Render(8..32)]
        );
        assert_eq!(scheduler.deferred(), 2);
    }

    #[test]
    fn test_out_of_order_offset_clamped() {
        let mut recorder = Recorder::default();
        FrameScheduler::run(32, [(20, 1), (5, 2)], &mut recorder);
        assert_eq!(
            recorder.steps,
            vec![
                Step::Render(0..20),
                Step::Apply(1),
                Step::Apply(2),
                Step::Render(20..32),
            ]
        );
    }

    proptest! {
        #[test]
        fn prop_ranges_tile_block(
            block_len in 1usize..512,
            mut offsets in proptest::collection::vec(0usize..600, 0..16),
        ) {
            offsets.sort_unstable();
            let mut recorder = Recorder::default();
            let events = offsets.iter().enumerate().map(|(i, &o)| (o, i as u32));
            FrameScheduler::run(block_len, events, &mut recorder);

            let mut expected_start = 0;
            let mut applied = Vec::new();
            for step in &recorder.steps {
                match step {
                    Step::Render(range) => {
                        prop_assert_eq!(range.start, expected_start);
                        prop_assert!(range.end > range.start);
                        expected_start = range.end;
                    }
                    Step::Apply(i) => {
                        // Applied exactly at the start of the next range
                        prop_assert_eq!(offsets[*i as usize], expected_start);
                        applied.push(*i);
                    }
                }
            }
            prop_assert_eq!(expected_start, block_len);

            let in_block = offsets.iter().filter(|&&o| o < block_len).count();
            prop_assert_eq!(applied, (0..in_block as u32).collect::<Vec<_>>());
        }
    }
}
