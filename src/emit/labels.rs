//! Branch labels and displacement fixups.
//!
//! Labels are opaque handles minted by one assembler and only valid there.
//! A branch to a label that is not yet marked commits the operand width of
//! the opcode it was emitted with and leaves a placeholder behind; the bake
//! pass patches every placeholder once all positions are known. A committed
//! one-byte displacement that ends up out of range is reported as an error
//! rather than re-encoded, since widening would shift every later offset.

use crate::{emit::stream::CodeStream, Error, Result};
use std::fmt;

/// Operand width a branch instruction committed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchWidth {
    /// One-byte signed displacement (`*.s` forms)
    Short,
    /// Four-byte signed displacement
    Long,
}

impl BranchWidth {
    /// Encoded operand size in bytes.
    #[must_use]
    pub fn len(&self) -> u32 {
        match self {
            BranchWidth::Short => 1,
            BranchWidth::Long => 4,
        }
    }
}

/// Opaque handle to a position in an instruction stream.
///
/// Created by [`IlAssembler::define_label`](crate::emit::IlAssembler::define_label)
/// and bound to a position by
/// [`IlAssembler::mark_label`](crate::emit::IlAssembler::mark_label). Handles
/// remember which assembler minted them; using one elsewhere is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label {
    owner: u32,
    index: u32,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index)
    }
}

#[derive(Debug, Default, Clone)]
struct LabelEntry {
    /// Stream offset the label was marked at
    position: Option<u32>,
    /// Largest stack depth recorded by branches targeting this label
    entry_depth: Option<u32>,
}

/// A placeholder operand awaiting its final displacement.
#[derive(Debug, Clone)]
struct Fixup {
    label: u32,
    /// Offset of the displacement operand inside the stream
    patch_offset: u32,
    /// Offset displacements are measured from (end of the owning instruction)
    base: u32,
    width: BranchWidth,
}

/// Per-assembler label storage and fixup queue.
#[derive(Debug, Clone)]
pub(crate) struct LabelTable {
    owner: u32,
    entries: Vec<LabelEntry>,
    fixups: Vec<Fixup>,
}

impl LabelTable {
    pub(crate) fn new(owner: u32) -> Self {
        LabelTable {
            owner,
            entries: Vec::new(),
            fixups: Vec::new(),
        }
    }

    /// Mints a fresh unmarked label.
    pub(crate) fn define(&mut self) -> Label {
        let index = self.entries.len() as u32;
        self.entries.push(LabelEntry::default());
        Label {
            owner: self.owner,
            index,
        }
    }

    /// Validates ownership and returns the entry index.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ForeignLabel`] if `label` was minted by a different
    /// assembler.
    fn check(&self, label: Label) -> Result<usize> {
        if label.owner != self.owner || label.index as usize >= self.entries.len() {
            return Err(Error::ForeignLabel(label));
        }
        Ok(label.index as usize)
    }

    /// Binds `label` to `position`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LabelRedefined`] if the label is already marked, or
    /// [`Error::ForeignLabel`] for a label from another assembler.
    pub(crate) fn mark(&mut self, label: Label, position: u32) -> Result<()> {
        let index = self.check(label)?;
        let entry = &mut self.entries[index];
        if entry.position.is_some() {
            return Err(Error::LabelRedefined(label));
        }
        entry.position = Some(position);
        Ok(())
    }

    /// Position the label was marked at, if any.
    pub(crate) fn position(&self, label: Label) -> Result<Option<u32>> {
        Ok(self.entries[self.check(label)?].position)
    }

    /// Records the stack depth a branch carried into `label`.
    ///
    /// The first recorded depth sticks; a later branch arriving with a
    /// greater depth returns the surplus so the caller can fold it into the
    /// depth adjustment instead of rewriting history.
    pub(crate) fn attach_depth(&mut self, label: Label, depth: u32) -> Result<u32> {
        let index = self.check(label)?;
        let entry = &mut self.entries[index];
        match entry.entry_depth {
            None => {
                entry.entry_depth = Some(depth);
                Ok(0)
            }
            Some(first) if depth > first => Ok(depth - first),
            Some(_) => Ok(0),
        }
    }

    /// Branch-recorded entry depth for `label`, if any branch targeted it.
    pub(crate) fn entry_depth(&self, label: Label) -> Result<Option<u32>> {
        Ok(self.entries[self.check(label)?].entry_depth)
    }

    /// Queues a displacement placeholder to be patched at bake.
    pub(crate) fn add_fixup(
        &mut self,
        label: Label,
        patch_offset: u32,
        base: u32,
        width: BranchWidth,
    ) -> Result<()> {
        let index = self.check(label)? as u32;
        self.fixups.push(Fixup {
            label: index,
            patch_offset,
            base,
            width,
        });
        Ok(())
    }

    /// Patches every queued placeholder with its final displacement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnresolvedLabel`] if a targeted label was never
    /// marked, or [`Error::ShortBranchOutOfRange`] if a one-byte displacement
    /// does not fit the committed width.
    pub(crate) fn resolve(&self, stream: &mut CodeStream) -> Result<()> {
        for fixup in &self.fixups {
            let handle = Label {
                owner: self.owner,
                index: fixup.label,
            };
            let target = self.entries[fixup.label as usize]
                .position
                .ok_or(Error::UnresolvedLabel(handle))?;
            let offset = i64::from(target) - i64::from(fixup.base);
            match fixup.width {
                BranchWidth::Short => {
                    let Ok(short) = i8::try_from(offset) else {
                        return Err(Error::ShortBranchOutOfRange {
                            position: fixup.patch_offset,
                            offset: offset as i32,
                        });
                    };
                    stream.patch_i8(fixup.patch_offset as usize, short)?;
                }
                BranchWidth::Long => {
                    stream.patch_i32(fixup.patch_offset as usize, offset as i32)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(len: usize) -> CodeStream {
        let mut stream = CodeStream::new();
        for _ in 0..len {
            stream.put_u8(0x00);
        }
        stream
    }

    #[test]
    fn mark_twice_is_rejected() {
        let mut table = LabelTable::new(7);
        let label = table.define();
        table.mark(label, 4).unwrap();
        assert!(matches!(
            table.mark(label, 8),
            Err(Error::LabelRedefined(l)) if l == label
        ));
        assert_eq!(table.position(label).unwrap(), Some(4));
    }

    #[test]
    fn foreign_labels_are_rejected() {
        let mut minting = LabelTable::new(1);
        let mut other = LabelTable::new(2);
        let label = minting.define();
        assert!(matches!(other.mark(label, 0), Err(Error::ForeignLabel(_))));
        assert!(matches!(
            other.attach_depth(label, 0),
            Err(Error::ForeignLabel(_))
        ));
    }

    #[test]
    fn short_fixup_patches_forward_displacement() {
        let mut table = LabelTable::new(0);
        let label = table.define();
        // br.s at 0, displacement byte at 1, next instruction at 2
        table.add_fixup(label, 1, 2, BranchWidth::Short).unwrap();
        table.mark(label, 10).unwrap();

        let mut stream = stream_of(12);
        table.resolve(&mut stream).unwrap();
        assert_eq!(stream.as_bytes()[1] as i8, 8);
    }

    #[test]
    fn long_fixup_patches_backward_displacement() {
        let mut table = LabelTable::new(0);
        let label = table.define();
        table.mark(label, 0).unwrap();
        // br at 6, displacement at 7, next instruction at 11
        table.add_fixup(label, 7, 11, BranchWidth::Long).unwrap();

        let mut stream = stream_of(11);
        table.resolve(&mut stream).unwrap();
        assert_eq!(
            &stream.as_bytes()[7..11],
            &(-11_i32).to_le_bytes(),
        );
    }

    #[test]
    fn short_fixup_out_of_range_is_reported() {
        let mut table = LabelTable::new(0);
        let label = table.define();
        table.add_fixup(label, 1, 2, BranchWidth::Short).unwrap();
        table.mark(label, 202).unwrap();

        let mut stream = stream_of(202);
        assert!(matches!(
            table.resolve(&mut stream),
            Err(Error::ShortBranchOutOfRange {
                position: 1,
                offset: 200
            })
        ));
    }

    #[test]
    fn unmarked_target_fails_resolution() {
        let mut table = LabelTable::new(0);
        let label = table.define();
        table.add_fixup(label, 1, 2, BranchWidth::Short).unwrap();

        let mut stream = stream_of(4);
        assert!(matches!(
            table.resolve(&mut stream),
            Err(Error::UnresolvedLabel(l)) if l == label
        ));
    }

    #[test]
    fn attach_depth_first_writer_wins() {
        let mut table = LabelTable::new(0);
        let label = table.define();
        assert_eq!(table.entry_depth(label).unwrap(), None);
        assert_eq!(table.attach_depth(label, 1).unwrap(), 0);
        assert_eq!(table.attach_depth(label, 3).unwrap(), 2);
        assert_eq!(table.attach_depth(label, 1).unwrap(), 0);
        assert_eq!(table.entry_depth(label).unwrap(), Some(1));
    }
}
