//! Incremental CIL emission for one method body.
//!
//! [`IlAssembler`] bundles the instruction stream, the label table, the
//! stack-depth tracker, and the exception region tracker of a single method
//! body under construction. Instructions are appended through the typed
//! `emit_*` entry points, branch targets are symbolic [`Label`]s that may be
//! marked before or after the branches referencing them, and protected
//! regions are opened and closed in structured-nesting order.
//!
//! [`IlAssembler::bake`] consumes the assembler and produces the immutable
//! [`MethodBody`]: branch fixups are patched, exception clauses sorted and
//! validated, the stack bound computed, and the local-variable signature
//! frozen. Consuming `self` makes a second bake of the same stream
//! unrepresentable.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    emit::{
        body::{MethodBody, TokenRelocation},
        labels::{BranchWidth, Label, LabelTable},
        opcodes::{self, FlowKind, OpCode, OperandKind},
        regions::{HandlerKind, RegionState, RegionTracker},
        stack::DepthTracker,
        stream::CodeStream,
    },
    metadata::{
        signatures::{local_var_signature, TypeSig},
        token::Token,
    },
    Error, Result,
};

/// Source of unique per-assembler stream ids, used to reject labels that
/// cross assembler boundaries.
static STREAM_IDS: AtomicU32 = AtomicU32::new(1);

fn expects(kind: OperandKind) -> &'static str {
    match kind {
        OperandKind::None => "no operand",
        OperandKind::Int8 => "a 1-byte signed operand",
        OperandKind::UInt8 => "a 1-byte unsigned operand",
        OperandKind::Int16 => "a 2-byte signed operand",
        OperandKind::UInt16 => "a 2-byte unsigned operand",
        OperandKind::Int32 => "a 4-byte signed operand",
        OperandKind::UInt32 => "a 4-byte unsigned operand",
        OperandKind::Int64 => "an 8-byte signed operand",
        OperandKind::UInt64 => "an 8-byte unsigned operand",
        OperandKind::Float32 => "a 4-byte float operand",
        OperandKind::Float64 => "an 8-byte float operand",
        OperandKind::Token => "a metadata token operand",
        OperandKind::Switch => "a switch target table",
    }
}

fn check_operand(op: &OpCode, kind: OperandKind) -> Result<()> {
    if op.operand == kind {
        Ok(())
    } else {
        Err(Error::WrongOperand {
            mnemonic: op.mnemonic,
            expected: expects(op.operand),
        })
    }
}

/// Assembles the instruction stream of one method body.
///
/// Exactly one assembler exists per method body; labels minted here are
/// rejected by every other assembler. All emission is mechanical in the
/// ECMA-335 sense: operand widths are enforced, token and branch bookkeeping
/// is automatic, but no semantic checking (does the field exist, is the
/// branch target sensible) takes place.
///
/// # Examples
///
/// ```rust
/// use cilforge::emit::{opcodes, IlAssembler};
///
/// let mut il = IlAssembler::new();
/// il.emit(&opcodes::LDARG_0)?;
/// il.emit(&opcodes::LDARG_1)?;
/// il.emit(&opcodes::ADD)?;
/// il.emit(&opcodes::RET)?;
///
/// let body = il.bake()?;
/// assert_eq!(body.code, vec![0x02, 0x03, 0x58, 0x2A]);
/// assert_eq!(body.max_stack, 2);
/// # Ok::<(), cilforge::Error>(())
/// ```
#[derive(Debug)]
pub struct IlAssembler {
    id: u32,
    stream: CodeStream,
    labels: LabelTable,
    depth: DepthTracker,
    regions: RegionTracker,
    locals: Vec<TypeSig>,
    relocations: Vec<TokenRelocation>,
}

impl IlAssembler {
    /// Creates an empty assembler with a fresh stream identity.
    #[must_use]
    pub fn new() -> Self {
        let id = STREAM_IDS.fetch_add(1, Ordering::Relaxed);
        IlAssembler {
            id,
            stream: CodeStream::new(),
            labels: LabelTable::new(id),
            depth: DepthTracker::new(),
            regions: RegionTracker::new(),
            locals: Vec::new(),
            relocations: Vec::new(),
        }
    }

    /// Identity of this stream, recorded by the container when the assembler
    /// is issued for a method.
    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    /// Current stream offset in bytes; the position the next instruction
    /// will be emitted at.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.stream.len() as u32
    }

    /// Applies an instruction's static stack effect and block-ending flow.
    fn apply_stack(&mut self, op: &OpCode) {
        self.depth.apply(u32::from(op.pops), u32::from(op.pushes));
        if op.flow.ends_block() {
            self.depth.transfer();
        }
    }

    /// Emits an instruction that takes no operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] if `op` carries an operand.
    pub fn emit(&mut self, op: &OpCode) -> Result<()> {
        check_operand(op, OperandKind::None)?;
        self.stream.reserve(2);
        self.stream.put_opcode(op);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with a 1-byte signed operand (`ldc.i4.s`).
    ///
    /// Short-form branches also carry a 1-byte signed operand, so this entry
    /// point accepts them with a raw displacement; label-based emission goes
    /// through [`IlAssembler::emit_branch`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_i1(&mut self, op: &OpCode, value: i8) -> Result<()> {
        check_operand(op, OperandKind::Int8)?;
        self.stream.reserve(3);
        self.stream.put_opcode(op);
        self.stream.put_i8(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with a 1-byte unsigned operand (`ldarg.s`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_u1(&mut self, op: &OpCode, value: u8) -> Result<()> {
        check_operand(op, OperandKind::UInt8)?;
        self.stream.reserve(3);
        self.stream.put_opcode(op);
        self.stream.put_u8(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with a 2-byte unsigned operand (`ldarg`,
    /// `stloc`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_u2(&mut self, op: &OpCode, value: u16) -> Result<()> {
        check_operand(op, OperandKind::UInt16)?;
        self.stream.reserve(4);
        self.stream.put_opcode(op);
        self.stream.put_u16(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with a 4-byte signed operand (`ldc.i4`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_i4(&mut self, op: &OpCode, value: i32) -> Result<()> {
        check_operand(op, OperandKind::Int32)?;
        self.stream.reserve(6);
        self.stream.put_opcode(op);
        self.stream.put_i32(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with an 8-byte signed operand (`ldc.i8`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_i8(&mut self, op: &OpCode, value: i64) -> Result<()> {
        check_operand(op, OperandKind::Int64)?;
        self.stream.reserve(10);
        self.stream.put_opcode(op);
        self.stream.put_i64(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with a 4-byte float operand (`ldc.r4`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_r4(&mut self, op: &OpCode, value: f32) -> Result<()> {
        check_operand(op, OperandKind::Float32)?;
        self.stream.reserve(6);
        self.stream.put_opcode(op);
        self.stream.put_f32(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits an instruction with an 8-byte float operand (`ldc.r8`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] on operand-width mismatch.
    pub fn emit_r8(&mut self, op: &OpCode, value: f64) -> Result<()> {
        check_operand(op, OperandKind::Float64)?;
        self.stream.reserve(10);
        self.stream.put_opcode(op);
        self.stream.put_f64(value);
        self.apply_stack(op);
        Ok(())
    }

    /// Writes a token operand, recording a relocation when it is pending.
    fn put_token_operand(&mut self, token: Token) {
        let offset = self.stream.len() as u32;
        self.stream.put_u32(token.value());
        if token.is_pending() {
            self.relocations.push(TokenRelocation { offset, token });
        }
    }

    /// Emits an instruction with a metadata token operand (`ldstr`,
    /// `ldfld`, `newarr`, ...).
    ///
    /// Pending tokens are written as placeholders and recorded in the body's
    /// relocation list; they are rewritten once their builders are created.
    /// Call-family instructions are accepted here with their static (zero)
    /// stack effect; use [`IlAssembler::emit_call`] when the call's true
    /// argument and return counts should drive the stack simulation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] if `op` does not take a token.
    pub fn emit_token(&mut self, op: &OpCode, token: Token) -> Result<()> {
        check_operand(op, OperandKind::Token)?;
        self.stream.reserve(6);
        self.stream.put_opcode(op);
        self.put_token_operand(token);
        self.apply_stack(op);
        Ok(())
    }

    /// Emits a call-family instruction (`call`, `calli`, `callvirt`,
    /// `newobj`) with its exact stack effect.
    ///
    /// # Arguments
    ///
    /// * `token` - method, member reference, or signature token
    /// * `pops` - slots consumed: arguments, plus `this` for instance calls,
    ///   plus the function pointer for `calli`
    /// * `pushes` - slots produced: 1 for a value-returning call or `newobj`,
    ///   0 otherwise
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] for an instruction outside the call
    /// family.
    pub fn emit_call(&mut self, op: &OpCode, token: Token, pops: u32, pushes: u32) -> Result<()> {
        if op.flow != FlowKind::Call {
            return Err(Error::WrongOperand {
                mnemonic: op.mnemonic,
                expected: "a direct operand, not a call site",
            });
        }
        self.stream.reserve(6);
        self.stream.put_opcode(op);
        self.put_token_operand(token);
        self.depth.apply(pops, pushes);
        Ok(())
    }

    /// Allocates a new unmarked label owned by this assembler.
    pub fn define_label(&mut self) -> Label {
        self.labels.define()
    }

    /// Binds `label` to the current stream position.
    ///
    /// The running stack depth is reconciled with the depth branches
    /// attached to the label: a lower attached depth folds the difference
    /// into the conservative adjustment, a higher one raises the running
    /// depth, and an unknown running depth (right after an unconditional
    /// transfer) resumes from the attached depth or from zero.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LabelRedefined`] on a second mark and
    /// [`Error::ForeignLabel`] for a label minted by another assembler.
    pub fn mark_label(&mut self, label: Label) -> Result<()> {
        let position = self.stream.len() as u32;
        self.labels.mark(label, position)?;
        match self.labels.entry_depth(label)? {
            Some(depth) => self.depth.reconcile(depth),
            None => self.depth.resume(),
        }
        Ok(())
    }

    /// Emits a branch instruction targeting `label`.
    ///
    /// Width selection follows the fixed-width commitment model:
    ///
    /// * a marked label resolves immediately; a short-form opcode whose
    ///   displacement fits a signed byte is written short, otherwise its
    ///   4-byte sibling is substituted (nothing was committed yet),
    /// * an unmarked label commits the opcode's own width and records a
    ///   fixup; a short-form fixup that later resolves out of range fails
    ///   the bake rather than being widened retroactively.
    ///
    /// `leave` branches attach depth 0 to their target, since leaving a
    /// protected region empties the evaluation stack.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilforge::emit::{opcodes, IlAssembler};
    ///
    /// let mut il = IlAssembler::new();
    /// let skip = il.define_label();
    /// il.emit(&opcodes::LDARG_0)?;
    /// il.emit_branch(&opcodes::BRFALSE_S, skip)?;
    /// il.emit(&opcodes::LDARG_1)?;
    /// il.emit(&opcodes::POP)?;
    /// il.mark_label(skip)?;
    /// il.emit(&opcodes::RET)?;
    ///
    /// let body = il.bake()?;
    /// assert_eq!(body.code[2] as i8, 2);
    /// # Ok::<(), cilforge::Error>(())
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] for a non-branch instruction,
    /// [`Error::ForeignLabel`] for a label from another assembler, and
    /// [`Error::ShortBranchOutOfRange`] when a short form without a long
    /// sibling cannot reach a marked target.
    pub fn emit_branch(&mut self, op: &OpCode, target: Label) -> Result<()> {
        if !op.flow.is_branch()
            || !matches!(op.operand, OperandKind::Int8 | OperandKind::Int32)
        {
            return Err(Error::WrongOperand {
                mnemonic: op.mnemonic,
                expected: expects(op.operand),
            });
        }
        let position = self.labels.position(target)?;

        self.depth.apply(u32::from(op.pops), 0);
        let attach = if op.flow == FlowKind::Leave {
            0
        } else {
            self.depth.depth()
        };
        let surplus = self.labels.attach_depth(target, attach)?;
        self.depth.fold(surplus);

        self.stream.reserve(6);
        match position {
            Some(marked) => {
                if op.is_short_branch() {
                    let base = self.stream.len() as i64 + op.opcode_len() as i64 + 1;
                    let displacement = i64::from(marked) - base;
                    if let Ok(short) = i8::try_from(displacement) {
                        self.stream.put_opcode(op);
                        self.stream.put_i8(short);
                    } else if let Some(wide) = op.long_form() {
                        self.put_resolved(wide, marked);
                    } else {
                        return Err(Error::ShortBranchOutOfRange {
                            position: self.stream.len() as u32 + op.opcode_len() as u32,
                            offset: displacement as i32,
                        });
                    }
                } else {
                    self.put_resolved(op, marked);
                }
            }
            None => {
                self.stream.put_opcode(op);
                let patch = self.stream.len() as u32;
                if op.operand == OperandKind::Int8 {
                    self.stream.put_i8(0);
                    self.labels
                        .add_fixup(target, patch, patch + 1, BranchWidth::Short)?;
                } else {
                    self.stream.put_i32(0);
                    self.labels
                        .add_fixup(target, patch, patch + 4, BranchWidth::Long)?;
                }
            }
        }
        if op.flow.ends_block() {
            self.depth.transfer();
        }
        Ok(())
    }

    /// Writes `op` with a resolved 4-byte displacement to `target`.
    fn put_resolved(&mut self, op: &OpCode, target: u32) {
        self.stream.put_opcode(op);
        let base = self.stream.len() as i64 + 4;
        self.stream.put_i32((i64::from(target) - base) as i32);
    }

    /// Emits a `switch` instruction with one 4-byte slot per target.
    ///
    /// Displacements are relative to the end of the whole instruction.
    /// Unmarked targets record width-4 fixups. An empty target list is
    /// legal and encodes a 0-case switch.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongOperand`] for a non-switch instruction and
    /// [`Error::ForeignLabel`] if any target belongs to another assembler.
    pub fn emit_switch(&mut self, op: &OpCode, targets: &[Label]) -> Result<()> {
        check_operand(op, OperandKind::Switch)?;
        for target in targets {
            self.labels.position(*target)?;
        }

        self.depth.apply(u32::from(op.pops), 0);
        let attach = self.depth.depth();

        self.stream.reserve(6 + 4 * targets.len());
        self.stream.put_opcode(op);
        self.stream.put_u32(targets.len() as u32);
        let end = self.stream.len() as u32 + 4 * targets.len() as u32;
        for target in targets {
            let surplus = self.labels.attach_depth(*target, attach)?;
            self.depth.fold(surplus);
            let patch = self.stream.len() as u32;
            match self.labels.position(*target)? {
                Some(marked) => {
                    self.stream
                        .put_i32((i64::from(marked) - i64::from(end)) as i32);
                }
                None => {
                    self.stream.put_i32(0);
                    self.labels
                        .add_fixup(*target, patch, end, BranchWidth::Long)?;
                }
            }
        }
        Ok(())
    }

    /// Declares a local variable slot and returns its index.
    ///
    /// The accumulated local types are frozen into a `LOCAL_SIG` blob at
    /// bake.
    ///
    /// # Errors
    ///
    /// Returns an error when the 16-bit local index space is exhausted.
    pub fn declare_local(&mut self, ty: TypeSig) -> Result<u16> {
        if self.locals.len() >= usize::from(u16::MAX) {
            return Err(Error::Error("local variable slots exhausted".to_string()));
        }
        let index = self.locals.len() as u16;
        self.locals.push(ty);
        Ok(index)
    }

    /// Opens a protected region at the current position and returns its
    /// shared end label.
    ///
    /// The end label is marked automatically by
    /// [`IlAssembler::end_protected_region`]; branching to it from inside
    /// the region (`leave`) is permitted.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilforge::{emit::{opcodes, IlAssembler}, metadata::token::Token};
    ///
    /// let mut il = IlAssembler::new();
    /// il.begin_protected_region();
    /// il.emit(&opcodes::NOP)?;
    /// il.begin_catch(Some(Token::new(0x0100_0001)))?;
    /// il.emit(&opcodes::POP)?;
    /// il.end_protected_region()?;
    /// il.emit(&opcodes::RET)?;
    ///
    /// let body = il.bake()?;
    /// assert_eq!(body.exception_clauses.len(), 1);
    /// # Ok::<(), cilforge::Error>(())
    /// ```
    pub fn begin_protected_region(&mut self) -> Label {
        let end = self.labels.define();
        self.regions.open(end, self.stream.len() as u32);
        end
    }

    /// Emits the implicit transfer that ends the current sub-block and
    /// seals its bookkeeping.
    fn close_sub_block(&mut self) -> Result<()> {
        let end = self.regions.end_label()?;
        match self.regions.state()? {
            RegionState::Filtering => return Err(Error::FilterNeedsCatch),
            RegionState::TryBody | RegionState::Handling(HandlerKind::Catch) => {
                self.emit_branch(&opcodes::LEAVE, end)?;
            }
            RegionState::Handling(_) => self.emit(&opcodes::ENDFINALLY)?,
        }
        self.regions.seal_sub_block(self.stream.len() as u32)
    }

    /// Opens a catch handler on the innermost protected region.
    ///
    /// From the try body or a previous handler this emits an implicit
    /// `leave` (or `endfinally`) first and requires `exception_type`; the
    /// region's try range is sealed by the first such transition. Following
    /// a filter expression this emits `endfilter` instead and
    /// `exception_type` must be `None`, since the filter supplies the match.
    /// The handler begins with the exception object on the stack.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInProtectedRegion`] with no open region,
    /// [`Error::CatchTypeMissing`] for a plain catch without a type, and
    /// [`Error::CatchTypeForbidden`] for a filter completion with one.
    pub fn begin_catch(&mut self, exception_type: Option<Token>) -> Result<()> {
        match self.regions.state()? {
            RegionState::Filtering => {
                if exception_type.is_some() {
                    return Err(Error::CatchTypeForbidden);
                }
                self.emit(&opcodes::ENDFILTER)?;
                let start = self.stream.len() as u32;
                self.regions.start_handler(HandlerKind::Catch, None, start)?;
            }
            _ => {
                let Some(token) = exception_type else {
                    return Err(Error::CatchTypeMissing);
                };
                self.close_sub_block()?;
                let start = self.stream.len() as u32;
                self.regions
                    .start_handler(HandlerKind::Catch, Some(token), start)?;
            }
        }
        self.depth.reseed(1);
        Ok(())
    }

    /// Opens a filter expression on the innermost protected region.
    ///
    /// The expression must end by transitioning to its catch handler via
    /// [`IlAssembler::begin_catch`]`(None)`. Filter code begins with the
    /// exception object on the stack and must leave exactly one decision
    /// value for the implicit `endfilter`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInProtectedRegion`] with no open region and
    /// [`Error::FilterNeedsCatch`] when a previous filter is still open.
    pub fn begin_filter(&mut self) -> Result<()> {
        self.close_sub_block()?;
        let start = self.stream.len() as u32;
        self.regions.start_filter(start)?;
        self.depth.reseed(1);
        Ok(())
    }

    /// Opens a finally handler on the innermost protected region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInProtectedRegion`] with no open region and
    /// [`Error::FilterNeedsCatch`] when a filter expression is still open.
    pub fn begin_finally(&mut self) -> Result<()> {
        self.close_sub_block()?;
        let start = self.stream.len() as u32;
        self.regions
            .start_handler(HandlerKind::Finally, None, start)?;
        self.depth.reseed(0);
        Ok(())
    }

    /// Opens a fault handler on the innermost protected region.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInProtectedRegion`] with no open region and
    /// [`Error::FilterNeedsCatch`] when a filter expression is still open.
    pub fn begin_fault(&mut self) -> Result<()> {
        self.close_sub_block()?;
        let start = self.stream.len() as u32;
        self.regions.start_handler(HandlerKind::Fault, None, start)?;
        self.depth.reseed(0);
        Ok(())
    }

    /// Closes the innermost protected region.
    ///
    /// Emits the final handler's implicit transfer (`leave` after a catch,
    /// `endfinally` after a finally or fault), marks the region's shared end
    /// label at the current position, and appends the region's clauses to
    /// the completed list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInProtectedRegion`] with no open region,
    /// [`Error::RegionNoHandler`] if the region never opened a handler, and
    /// [`Error::FilterNeedsCatch`] if a filter expression is still open.
    pub fn end_protected_region(&mut self) -> Result<()> {
        let end = self.regions.end_label()?;
        match self.regions.state()? {
            RegionState::TryBody => return Err(Error::RegionNoHandler),
            RegionState::Filtering => return Err(Error::FilterNeedsCatch),
            RegionState::Handling(HandlerKind::Catch) => {
                self.emit_branch(&opcodes::LEAVE, end)?;
            }
            RegionState::Handling(_) => self.emit(&opcodes::ENDFINALLY)?,
        }
        self.regions.close(self.stream.len() as u32)?;
        self.mark_label(end)
    }

    /// Bakes the accumulated state into an immutable [`MethodBody`].
    ///
    /// Sequence: open exception regions are rejected, the fixup patch pass
    /// runs over the byte buffer, exception clauses are sorted and validated
    /// innermost-first, the stack bound is pulled from the depth tracker,
    /// and the local signature blob is frozen. The assembler is consumed;
    /// re-baking the same stream is unrepresentable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnclosedRegion`] for regions left open,
    /// [`Error::UnresolvedLabel`] for a branch target never marked,
    /// [`Error::ShortBranchOutOfRange`] for a committed short-form fixup
    /// that cannot encode its displacement, and [`Error::RegionOverlap`] for
    /// partially overlapping try ranges.
    pub fn bake(mut self) -> Result<MethodBody> {
        let open = self.regions.open_count();
        if open > 0 {
            return Err(Error::UnclosedRegion(open));
        }
        self.labels.resolve(&mut self.stream)?;
        let exception_clauses = self.regions.into_clauses()?;
        let max_stack = self.depth.max_stack();
        let local_signature = if self.locals.is_empty() {
            None
        } else {
            Some(local_var_signature(&self.locals)?)
        };
        Ok(MethodBody {
            code: self.stream.into_bytes(),
            max_stack,
            local_signature,
            exception_clauses,
            relocations: self.relocations,
        })
    }
}

impl Default for IlAssembler {
    fn default() -> Self {
        IlAssembler::new()
    }
}
