//! Evaluation-stack depth simulation.
//!
//! The assembler tracks a conservative upper bound on the evaluation-stack
//! depth while instructions are emitted, so the method body header can carry
//! a `max_stack` value without a separate verification pass. The simulation
//! is linear over the emission order, not a dataflow analysis: branches only
//! propagate their recorded depth to the target label, and disagreements are
//! resolved upward. The reported bound may therefore exceed the true maximum
//! but never under-reports it.

/// Linear evaluation-stack depth tracker.
///
/// Three quantities are maintained:
///
/// * `current` - depth after the last emitted instruction, or `None` when the
///   previous instruction transferred control unconditionally and no label
///   has re-established a depth yet,
/// * `max` - highest depth observed so far,
/// * `adjustment` - accumulated slack from clamped underflows and depth
///   disagreements at labels.
///
/// The final bound is `max + adjustment`, clamped to the method header limit
/// of `0xFFFF`.
#[derive(Debug, Default, Clone)]
pub struct DepthTracker {
    current: Option<u32>,
    max: u32,
    adjustment: u32,
}

impl DepthTracker {
    /// Creates a tracker with an empty stack at depth zero.
    #[must_use]
    pub fn new() -> Self {
        DepthTracker {
            current: Some(0),
            max: 0,
            adjustment: 0,
        }
    }

    /// Applies the stack effect of one instruction.
    ///
    /// When the current depth is unknown the instruction is assumed to start
    /// from an empty stack. Pops beyond the current depth clamp at zero and
    /// the deficit is added to the adjustment, so `max_stack` still covers
    /// the path that actually supplied those values.
    pub fn apply(&mut self, pops: u32, pushes: u32) {
        let mut depth = self.current.unwrap_or(0);
        if pops > depth {
            self.adjustment = self.adjustment.saturating_add(pops - depth);
            depth = 0;
        } else {
            depth -= pops;
        }
        depth = depth.saturating_add(pushes);
        if depth > self.max {
            self.max = depth;
        }
        self.current = Some(depth);
    }

    /// Marks the depth unknown after an unconditional control transfer.
    pub fn transfer(&mut self) {
        self.current = None;
    }

    /// Re-establishes depth zero if the current depth is unknown.
    ///
    /// Marking a label no branch has targeted yet does this: the region was
    /// unreachable in emission order, so it conservatively starts empty.
    pub fn resume(&mut self) {
        if self.current.is_none() {
            self.current = Some(0);
        }
    }

    /// Adds slack directly to the adjustment accumulator.
    ///
    /// Used when a branch attaches a greater depth to a label than an
    /// earlier branch already recorded there.
    pub fn fold(&mut self, surplus: u32) {
        self.adjustment = self.adjustment.saturating_add(surplus);
    }

    /// Current depth, treating unknown as zero. Recorded on labels when a
    /// branch is emitted.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.current.unwrap_or(0)
    }

    /// Reconciles the tracker with a depth recorded on a label being marked
    /// here, or seeds the entry depth of a handler region.
    ///
    /// An unknown current depth adopts `depth` outright. Otherwise the larger
    /// of the two wins and the difference is folded into the adjustment, so
    /// neither the fall-through path nor the branching path can exceed the
    /// reported bound.
    pub fn reconcile(&mut self, depth: u32) {
        match self.current {
            None => {
                self.current = Some(depth);
                if depth > self.max {
                    self.max = depth;
                }
            }
            Some(current) if depth > current => {
                self.adjustment = self.adjustment.saturating_add(depth - current);
                self.current = Some(depth);
                if depth > self.max {
                    self.max = depth;
                }
            }
            Some(current) => {
                self.adjustment = self.adjustment.saturating_add(current - depth);
            }
        }
    }

    /// Forces the current depth, discarding any previous value.
    ///
    /// Handler entry points use this: the CLR pushes the exception object
    /// before entering catch and filter regions (depth 1) and enters finally
    /// and fault regions on an empty stack (depth 0).
    pub fn reseed(&mut self, depth: u32) {
        self.current = Some(depth);
        if depth > self.max {
            self.max = depth;
        }
    }

    /// Final `max_stack` bound for the method header.
    #[must_use]
    pub fn max_stack(&self) -> u16 {
        self.max
            .saturating_add(self.adjustment)
            .min(u32::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_running_maximum() {
        let mut tracker = DepthTracker::new();
        tracker.apply(0, 1);
        tracker.apply(0, 1);
        tracker.apply(1, 0);
        tracker.apply(0, 1);
        assert_eq!(tracker.depth(), 2);
        assert_eq!(tracker.max_stack(), 2);
    }

    #[test]
    fn underflow_clamps_and_adjusts() {
        let mut tracker = DepthTracker::new();
        tracker.apply(1, 0);
        assert_eq!(tracker.depth(), 0);
        assert_eq!(tracker.max_stack(), 1);

        tracker.apply(2, 1);
        assert_eq!(tracker.depth(), 1);
        assert_eq!(tracker.max_stack(), 4);
    }

    #[test]
    fn unknown_depth_resumes_from_zero() {
        let mut tracker = DepthTracker::new();
        tracker.apply(0, 3);
        tracker.transfer();
        assert_eq!(tracker.depth(), 0);
        tracker.apply(0, 1);
        assert_eq!(tracker.depth(), 1);
        assert_eq!(tracker.max_stack(), 3);
    }

    #[test]
    fn reconcile_takes_larger_depth() {
        let mut tracker = DepthTracker::new();
        tracker.apply(0, 1);
        tracker.reconcile(3);
        assert_eq!(tracker.depth(), 3);
        assert_eq!(tracker.max_stack(), 5);

        let mut tracker = DepthTracker::new();
        tracker.apply(0, 2);
        tracker.reconcile(1);
        assert_eq!(tracker.depth(), 2);
        assert_eq!(tracker.max_stack(), 3);
    }

    #[test]
    fn reconcile_after_transfer_adopts_label_depth() {
        let mut tracker = DepthTracker::new();
        tracker.transfer();
        tracker.reconcile(2);
        assert_eq!(tracker.depth(), 2);
        assert_eq!(tracker.max_stack(), 2);
    }

    #[test]
    fn handler_entry_reseed() {
        let mut tracker = DepthTracker::new();
        tracker.apply(0, 1);
        tracker.transfer();
        tracker.reseed(1);
        assert_eq!(tracker.depth(), 1);
        tracker.apply(1, 0);
        assert_eq!(tracker.depth(), 0);
        assert_eq!(tracker.max_stack(), 1);
    }
}
