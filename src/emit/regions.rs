//! Exception region tracking for method bodies under construction.
//!
//! Protected regions nest as a stack while instructions are emitted: opening
//! a region pushes it, handler transitions rewrite the top, and closing pops
//! it onto a flat clause list. The flat list is what the method body header
//! serializes, one entry per handler clause, with multiple clauses of one
//! protected block sharing the same try range.
//!
//! The tracker is pure bookkeeping over stream offsets. The assembler owns
//! the implicit control transfers (`leave`, `endfilter`, `endfinally`) that
//! accompany each transition and reports the resulting offsets here.

use crate::{metadata::token::Token, Error, Result};
use bitflags::bitflags;

use super::labels::Label;

bitflags! {
    /// Exception handling clause flags as serialized in the method body.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClauseFlags: u32 {
        /// A typed exception clause.
        ///
        /// The `class_token` field names the exception type this handler
        /// catches.
        const EXCEPTION = 0x0000;

        /// An exception filter and handler clause.
        ///
        /// The filter code runs first to decide whether the handler accepts
        /// the exception.
        const FILTER = 0x0001;

        /// A finally clause, entered on both normal and exceptional exit.
        const FINALLY = 0x0002;

        /// A fault clause, entered only when an exception is thrown.
        const FAULT = 0x0004;
    }
}

/// One serialized exception handling clause.
///
/// Offsets and lengths are byte positions in the finished instruction
/// stream. For [`ClauseFlags::EXCEPTION`] clauses `class_token` carries the
/// caught type; for [`ClauseFlags::FILTER`] clauses `filter_offset` points at
/// the start of the filter expression and the class token is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionClause {
    /// Clause kind.
    pub flags: ClauseFlags,
    /// Offset in bytes of the try block from the start of the method body.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Offset of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// Exception type handled by an [`ClauseFlags::EXCEPTION`] clause.
    pub class_token: Option<Token>,
    /// Start of the filter expression for a [`ClauseFlags::FILTER`] clause.
    pub filter_offset: u32,
}

/// Handler classes a sub-block can open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerKind {
    Catch,
    Finally,
    Fault,
}

/// Position of the innermost open region in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RegionState {
    /// Protected code is being emitted
    TryBody,
    /// A filter expression is being emitted
    Filtering,
    /// A handler body is being emitted
    Handling(HandlerKind),
}

#[derive(Debug, Clone)]
struct OpenRegion {
    end_label: Label,
    try_start: u32,
    /// Shared by every clause of this region, set at the first transition out
    /// of the try body
    try_end: Option<u32>,
    state: RegionState,
    handler_start: u32,
    class_token: Option<Token>,
    filter_start: Option<u32>,
    clauses: Vec<ExceptionClause>,
}

impl OpenRegion {
    fn try_length(&self) -> u32 {
        self.try_end.map_or(0, |end| end - self.try_start)
    }

    /// Completes the clause for the handler sub-block ending at `offset`.
    fn seal_handler(&mut self, kind: HandlerKind, offset: u32) {
        let flags = match kind {
            HandlerKind::Catch if self.filter_start.is_some() => ClauseFlags::FILTER,
            HandlerKind::Catch => ClauseFlags::EXCEPTION,
            HandlerKind::Finally => ClauseFlags::FINALLY,
            HandlerKind::Fault => ClauseFlags::FAULT,
        };
        self.clauses.push(ExceptionClause {
            flags,
            try_offset: self.try_start,
            try_length: self.try_length(),
            handler_offset: self.handler_start,
            handler_length: offset - self.handler_start,
            class_token: self.class_token.take(),
            filter_offset: self.filter_start.take().unwrap_or(0),
        });
    }
}

/// Stack of in-progress protected regions plus the flat closed-clause list.
#[derive(Debug, Default, Clone)]
pub(crate) struct RegionTracker {
    stack: Vec<OpenRegion>,
    closed: Vec<ExceptionClause>,
}

impl RegionTracker {
    pub(crate) fn new() -> Self {
        RegionTracker::default()
    }

    /// Number of regions still open.
    pub(crate) fn open_count(&self) -> usize {
        self.stack.len()
    }

    /// Pushes a new protected region whose try block starts at `try_start`.
    pub(crate) fn open(&mut self, end_label: Label, try_start: u32) {
        self.stack.push(OpenRegion {
            end_label,
            try_start,
            try_end: None,
            state: RegionState::TryBody,
            handler_start: 0,
            class_token: None,
            filter_start: None,
            clauses: Vec::new(),
        });
    }

    fn innermost(&mut self) -> Result<&mut OpenRegion> {
        self.stack.last_mut().ok_or(Error::NotInProtectedRegion)
    }

    /// State of the innermost open region.
    pub(crate) fn state(&self) -> Result<RegionState> {
        self.stack
            .last()
            .map(|region| region.state)
            .ok_or(Error::NotInProtectedRegion)
    }

    /// Shared end label of the innermost open region.
    pub(crate) fn end_label(&self) -> Result<Label> {
        self.stack
            .last()
            .map(|region| region.end_label)
            .ok_or(Error::NotInProtectedRegion)
    }

    /// Ends the current sub-block at `offset`, the position after the
    /// assembler's implicit control transfer.
    ///
    /// Ending the try body records the shared try range; ending a handler
    /// completes its clause. The filter state has no transfer of its own and
    /// is rejected here, its only exit is the catch transition.
    pub(crate) fn seal_sub_block(&mut self, offset: u32) -> Result<()> {
        let region = self.innermost()?;
        match region.state {
            RegionState::TryBody => {
                region.try_end = Some(offset);
                Ok(())
            }
            RegionState::Filtering => Err(Error::FilterNeedsCatch),
            RegionState::Handling(kind) => {
                region.seal_handler(kind, offset);
                Ok(())
            }
        }
    }

    /// Begins a filter expression at `offset`.
    pub(crate) fn start_filter(&mut self, offset: u32) -> Result<()> {
        let region = self.innermost()?;
        region.state = RegionState::Filtering;
        region.filter_start = Some(offset);
        Ok(())
    }

    /// Begins a handler body at `offset`.
    pub(crate) fn start_handler(
        &mut self,
        kind: HandlerKind,
        class_token: Option<Token>,
        offset: u32,
    ) -> Result<()> {
        let region = self.innermost()?;
        region.state = RegionState::Handling(kind);
        region.handler_start = offset;
        region.class_token = class_token;
        Ok(())
    }

    /// Pops the innermost region, its final handler having ended at
    /// `offset`, and appends its clauses to the closed list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RegionNoHandler`] when the region never left its try
    /// body and [`Error::FilterNeedsCatch`] when a filter expression is still
    /// open.
    pub(crate) fn close(&mut self, offset: u32) -> Result<()> {
        let region = self.innermost()?;
        match region.state {
            RegionState::TryBody => return Err(Error::RegionNoHandler),
            RegionState::Filtering => return Err(Error::FilterNeedsCatch),
            RegionState::Handling(kind) => region.seal_handler(kind, offset),
        }
        if let Some(region) = self.stack.pop() {
            self.closed.extend(region.clauses);
        }
        Ok(())
    }

    /// Validates and orders the closed clauses for serialization.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnclosedRegion`] if any region is still open and
    /// [`Error::RegionOverlap`] if two try ranges partially overlap.
    pub(crate) fn into_clauses(self) -> Result<Vec<ExceptionClause>> {
        if !self.stack.is_empty() {
            return Err(Error::UnclosedRegion(self.stack.len()));
        }
        sort_innermost_first(self.closed)
    }
}

fn try_range(clause: &ExceptionClause) -> (u32, u32) {
    (clause.try_offset, clause.try_offset + clause.try_length)
}

/// True when `inner` lies strictly inside `outer` (equal ranges excluded).
fn strictly_contains(outer: &ExceptionClause, inner: &ExceptionClause) -> bool {
    let (outer_start, outer_end) = try_range(outer);
    let (inner_start, inner_end) = try_range(inner);
    outer_start <= inner_start
        && inner_end <= outer_end
        && (outer_start, outer_end) != (inner_start, inner_end)
}

fn disjoint(a: &ExceptionClause, b: &ExceptionClause) -> bool {
    let (a_start, a_end) = try_range(a);
    let (b_start, b_end) = try_range(b);
    a_end <= b_start || b_end <= a_start
}

/// Orders clauses so every nested try range precedes the ranges enclosing
/// it, keeping the original order among clauses that do not nest.
///
/// Every pair of try ranges must be identical, strictly nested, or disjoint;
/// anything else is a structural error.
fn sort_innermost_first(clauses: Vec<ExceptionClause>) -> Result<Vec<ExceptionClause>> {
    for (index, a) in clauses.iter().enumerate() {
        for b in &clauses[index + 1..] {
            let compatible = try_range(a) == try_range(b)
                || strictly_contains(a, b)
                || strictly_contains(b, a)
                || disjoint(a, b);
            if !compatible {
                return Err(Error::RegionOverlap {
                    first: a.try_offset,
                    second: b.try_offset,
                });
            }
        }
    }

    // Nesting depth is the number of other try ranges strictly containing a
    // clause; sorting by descending depth puts innermost clauses first while
    // the stable sort keeps emission order among siblings.
    let depths: Vec<usize> = clauses
        .iter()
        .map(|clause| {
            clauses
                .iter()
                .filter(|other| strictly_contains(other, clause))
                .count()
        })
        .collect();
    let mut keyed: Vec<(usize, ExceptionClause)> = depths.into_iter().zip(clauses).collect();
    keyed.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(keyed.into_iter().map(|(_, clause)| clause).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emit::labels::LabelTable;

    fn clause(try_offset: u32, try_length: u32) -> ExceptionClause {
        ExceptionClause {
            flags: ClauseFlags::EXCEPTION,
            try_offset,
            try_length,
            handler_offset: try_offset + try_length,
            handler_length: 4,
            class_token: Some(Token::new(0x0100_0001)),
            filter_offset: 0,
        }
    }

    fn end_label() -> Label {
        LabelTable::new(0).define()
    }

    #[test]
    fn single_catch_region() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        tracker.seal_sub_block(10).unwrap();
        tracker
            .start_handler(HandlerKind::Catch, Some(Token::new(0x0100_0001)), 10)
            .unwrap();
        tracker.close(20).unwrap();

        let clauses = tracker.into_clauses().unwrap();
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].flags, ClauseFlags::EXCEPTION);
        assert_eq!(clauses[0].try_offset, 0);
        assert_eq!(clauses[0].try_length, 10);
        assert_eq!(clauses[0].handler_offset, 10);
        assert_eq!(clauses[0].handler_length, 10);
        assert_eq!(clauses[0].class_token, Some(Token::new(0x0100_0001)));
    }

    #[test]
    fn multiple_clauses_share_try_range() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        tracker.seal_sub_block(8).unwrap();
        tracker
            .start_handler(HandlerKind::Catch, Some(Token::new(0x0100_0001)), 8)
            .unwrap();
        tracker.seal_sub_block(16).unwrap();
        tracker.start_handler(HandlerKind::Finally, None, 16).unwrap();
        tracker.close(24).unwrap();

        let clauses = tracker.into_clauses().unwrap();
        assert_eq!(clauses.len(), 2);
        assert_eq!(clauses[0].try_offset, clauses[1].try_offset);
        assert_eq!(clauses[0].try_length, clauses[1].try_length);
        assert_eq!(clauses[0].flags, ClauseFlags::EXCEPTION);
        assert_eq!(clauses[1].flags, ClauseFlags::FINALLY);
    }

    #[test]
    fn filter_clause_records_filter_offset() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        tracker.seal_sub_block(6).unwrap();
        tracker.start_filter(6).unwrap();
        tracker.start_handler(HandlerKind::Catch, None, 12).unwrap();
        tracker.close(18).unwrap();

        let clauses = tracker.into_clauses().unwrap();
        assert_eq!(clauses[0].flags, ClauseFlags::FILTER);
        assert_eq!(clauses[0].filter_offset, 6);
        assert_eq!(clauses[0].handler_offset, 12);
        assert_eq!(clauses[0].class_token, None);
    }

    #[test]
    fn close_without_handler_is_rejected() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        assert!(matches!(tracker.close(4), Err(Error::RegionNoHandler)));
    }

    #[test]
    fn abandoned_filter_is_rejected() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        tracker.seal_sub_block(4).unwrap();
        tracker.start_filter(4).unwrap();
        assert!(matches!(tracker.close(8), Err(Error::FilterNeedsCatch)));
        assert!(matches!(
            tracker.seal_sub_block(8),
            Err(Error::FilterNeedsCatch)
        ));
    }

    #[test]
    fn operations_require_an_open_region() {
        let mut tracker = RegionTracker::new();
        assert!(matches!(
            tracker.seal_sub_block(0),
            Err(Error::NotInProtectedRegion)
        ));
        assert!(matches!(tracker.close(0), Err(Error::NotInProtectedRegion)));
        assert!(matches!(
            tracker.state(),
            Err(Error::NotInProtectedRegion)
        ));
    }

    #[test]
    fn unclosed_regions_fail_at_bake() {
        let mut tracker = RegionTracker::new();
        tracker.open(end_label(), 0);
        tracker.open(end_label(), 2);
        assert!(matches!(
            tracker.into_clauses(),
            Err(Error::UnclosedRegion(2))
        ));
    }

    #[test]
    fn disjoint_regions_keep_emission_order() {
        let clauses = vec![clause(0, 10), clause(20, 10)];
        let sorted = sort_innermost_first(clauses).unwrap();
        assert_eq!(sorted[0].try_offset, 0);
        assert_eq!(sorted[1].try_offset, 20);
    }

    #[test]
    fn nested_region_precedes_enclosing() {
        let clauses = vec![clause(0, 30), clause(5, 10)];
        let sorted = sort_innermost_first(clauses).unwrap();
        assert_eq!(sorted[0].try_offset, 5);
        assert_eq!(sorted[1].try_offset, 0);
    }

    #[test]
    fn partial_overlap_is_a_structural_error() {
        let clauses = vec![clause(0, 10), clause(5, 10)];
        assert!(matches!(
            sort_innermost_first(clauses),
            Err(Error::RegionOverlap {
                first: 0,
                second: 5
            })
        ));
    }
}
