//! CIL opcode descriptors (ECMA-335).
//!
//! This module provides one [`OpCode`] constant per CIL instruction, carrying
//! everything the emission layer needs to encode it: the opcode bytes (with
//! the `0xFE` prefix for extended instructions), the operand form, the control
//! flow class, and the static evaluation-stack effect. Single-byte opcodes are
//! named after their mnemonic (e.g. [`CALL`] for `0x28`); extended opcodes use
//! their plain mnemonic as well (e.g. [`CEQ`] for `0xFE 0x01`).
//!
//! Call-family instructions carry a zero static stack effect; their true
//! effect depends on the referenced signature and is supplied at the emit call.

use strum::{EnumCount, EnumIter};

/// Shared first byte of all extended opcodes.
pub const FE_PREFIX: u8 = 0xFE;

/// Operand forms an instruction can carry.
///
/// The form determines how many bytes follow the opcode and which emit entry
/// point accepts the instruction. Branch instructions carry `Int8`/`Int32`
/// relative offsets; their branch nature is expressed by [`FlowKind`], not by
/// a separate operand form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
pub enum OperandKind {
    /// No operand present
    None,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Signed 16-bit integer
    Int16,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Unsigned 32-bit integer
    UInt32,
    /// Signed 64-bit integer
    Int64,
    /// Unsigned 64-bit integer
    UInt64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// Metadata token reference
    Token,
    /// Switch table operand
    Switch,
}

impl OperandKind {
    /// Returns the size in bytes of this operand form.
    ///
    /// Returns `Some(size)` for fixed-size operands, or `None` for `Switch`,
    /// whose size depends on the number of targets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use cilforge::emit::OperandKind;
    ///
    /// assert_eq!(OperandKind::None.size(), Some(0));
    /// assert_eq!(OperandKind::Int8.size(), Some(1));
    /// assert_eq!(OperandKind::Token.size(), Some(4));
    /// assert_eq!(OperandKind::Switch.size(), None);
    /// ```
    #[must_use]
    pub fn size(&self) -> Option<usize> {
        match self {
            OperandKind::None => Some(0),
            OperandKind::Int8 | OperandKind::UInt8 => Some(1),
            OperandKind::Int16 | OperandKind::UInt16 => Some(2),
            OperandKind::Int32
            | OperandKind::UInt32
            | OperandKind::Float32
            | OperandKind::Token => Some(4),
            OperandKind::Int64 | OperandKind::UInt64 | OperandKind::Float64 => Some(8),
            OperandKind::Switch => None,
        }
    }
}

/// Control flow classes of CIL instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally/fault block or of a filter expression
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
}

impl FlowKind {
    /// Returns true if an instruction of this class transfers control
    /// unconditionally, so the instruction after it starts a new
    /// unreachable-until-labeled region.
    #[must_use]
    pub fn ends_block(&self) -> bool {
        matches!(
            self,
            FlowKind::UnconditionalBranch
                | FlowKind::Return
                | FlowKind::Throw
                | FlowKind::EndFinally
                | FlowKind::Leave
        )
    }

    /// Returns true for the flow classes that take a label operand.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            FlowKind::ConditionalBranch | FlowKind::UnconditionalBranch | FlowKind::Leave
        )
    }
}

/// A CIL opcode descriptor.
///
/// Descriptors are static data; the emission layer selects encoding, operand
/// validation, and stack simulation from their fields. The constants in this
/// module cover the complete ECMA-335 instruction set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCode {
    /// Instruction mnemonic as it appears in IL listings
    pub mnemonic: &'static str,
    /// First opcode byte (`0x00` page) or [`FE_PREFIX`] for extended instructions
    pub prefix: u8,
    /// Opcode byte (the second byte for extended instructions)
    pub code: u8,
    /// Operand form following the opcode bytes
    pub operand: OperandKind,
    /// Control flow class
    pub flow: FlowKind,
    /// Number of evaluation-stack slots popped (static part)
    pub pops: u8,
    /// Number of evaluation-stack slots pushed (static part)
    pub pushes: u8,
}

impl OpCode {
    /// Returns the encoded length of the opcode bytes alone (1 or 2).
    #[must_use]
    pub fn opcode_len(&self) -> usize {
        if self.prefix == FE_PREFIX {
            2
        } else {
            1
        }
    }

    /// Returns the fixed encoded length of the whole instruction, or `None`
    /// for `switch`, whose length depends on the target count.
    #[must_use]
    pub fn fixed_len(&self) -> Option<usize> {
        Some(self.opcode_len() + self.operand.size()?)
    }

    /// Returns true for branch instructions with a one-byte relative operand.
    #[must_use]
    pub fn is_short_branch(&self) -> bool {
        self.flow.is_branch() && self.operand == OperandKind::Int8
    }

    /// Returns the 4-byte-operand sibling of a short-form branch.
    ///
    /// Marked-label branches whose offset does not fit the short form are
    /// emitted through this sibling. Non-branch opcodes and long forms return
    /// `None`.
    #[must_use]
    pub fn long_form(&self) -> Option<&'static OpCode> {
        if self.prefix != 0x00 {
            return None;
        }
        match self.code {
            0x2B => Some(&BR),
            0x2C => Some(&BRFALSE),
            0x2D => Some(&BRTRUE),
            0x2E => Some(&BEQ),
            0x2F => Some(&BGE),
            0x30 => Some(&BGT),
            0x31 => Some(&BLE),
            0x32 => Some(&BLT),
            0x33 => Some(&BNE_UN),
            0x34 => Some(&BGE_UN),
            0x35 => Some(&BGT_UN),
            0x36 => Some(&BLE_UN),
            0x37 => Some(&BLT_UN),
            0xDE => Some(&LEAVE),
            _ => None,
        }
    }
}

const fn op(
    mnemonic: &'static str,
    code: u8,
    operand: OperandKind,
    flow: FlowKind,
    pops: u8,
    pushes: u8,
) -> OpCode {
    OpCode {
        mnemonic,
        prefix: 0x00,
        code,
        operand,
        flow,
        pops,
        pushes,
    }
}

const fn op_fe(
    mnemonic: &'static str,
    code: u8,
    operand: OperandKind,
    flow: FlowKind,
    pops: u8,
    pushes: u8,
) -> OpCode {
    OpCode {
        mnemonic,
        prefix: FE_PREFIX,
        code,
        operand,
        flow,
        pops,
        pushes,
    }
}

#[allow(missing_docs)]
mod table {
    use super::{op, op_fe, FlowKind, OpCode, OperandKind};
    use FlowKind::{
        Call, ConditionalBranch, EndFinally, Leave, Return, Sequential, Switch as SwitchFlow,
        Throw, UnconditionalBranch,
    };
    use OperandKind::{
        Float32, Float64, Int32, Int64, Int8, None as NoOperand, Switch as SwitchOperand, Token,
        UInt16, UInt8,
    };

    // ── Single-byte opcodes (0x00 – 0xE0) ──────────────────────────────────

    // Misc
    pub const NOP: OpCode = op("nop", 0x00, NoOperand, Sequential, 0, 0);
    pub const BREAK: OpCode = op("break", 0x01, NoOperand, Sequential, 0, 0);

    // Load/store argument shorthand
    pub const LDARG_0: OpCode = op("ldarg.0", 0x02, NoOperand, Sequential, 0, 1);
    pub const LDARG_1: OpCode = op("ldarg.1", 0x03, NoOperand, Sequential, 0, 1);
    pub const LDARG_2: OpCode = op("ldarg.2", 0x04, NoOperand, Sequential, 0, 1);
    pub const LDARG_3: OpCode = op("ldarg.3", 0x05, NoOperand, Sequential, 0, 1);

    // Load/store local shorthand
    pub const LDLOC_0: OpCode = op("ldloc.0", 0x06, NoOperand, Sequential, 0, 1);
    pub const LDLOC_1: OpCode = op("ldloc.1", 0x07, NoOperand, Sequential, 0, 1);
    pub const LDLOC_2: OpCode = op("ldloc.2", 0x08, NoOperand, Sequential, 0, 1);
    pub const LDLOC_3: OpCode = op("ldloc.3", 0x09, NoOperand, Sequential, 0, 1);
    pub const STLOC_0: OpCode = op("stloc.0", 0x0A, NoOperand, Sequential, 1, 0);
    pub const STLOC_1: OpCode = op("stloc.1", 0x0B, NoOperand, Sequential, 1, 0);
    pub const STLOC_2: OpCode = op("stloc.2", 0x0C, NoOperand, Sequential, 1, 0);
    pub const STLOC_3: OpCode = op("stloc.3", 0x0D, NoOperand, Sequential, 1, 0);

    // Load/store argument/local (short form)
    pub const LDARG_S: OpCode = op("ldarg.s", 0x0E, UInt8, Sequential, 0, 1);
    pub const LDARGA_S: OpCode = op("ldarga.s", 0x0F, UInt8, Sequential, 0, 1);
    pub const STARG_S: OpCode = op("starg.s", 0x10, UInt8, Sequential, 1, 0);
    pub const LDLOC_S: OpCode = op("ldloc.s", 0x11, UInt8, Sequential, 0, 1);
    pub const LDLOCA_S: OpCode = op("ldloca.s", 0x12, UInt8, Sequential, 0, 1);
    pub const STLOC_S: OpCode = op("stloc.s", 0x13, UInt8, Sequential, 1, 0);

    // Null / constant loaders
    pub const LDNULL: OpCode = op("ldnull", 0x14, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_M1: OpCode = op("ldc.i4.m1", 0x15, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_0: OpCode = op("ldc.i4.0", 0x16, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_1: OpCode = op("ldc.i4.1", 0x17, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_2: OpCode = op("ldc.i4.2", 0x18, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_3: OpCode = op("ldc.i4.3", 0x19, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_4: OpCode = op("ldc.i4.4", 0x1A, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_5: OpCode = op("ldc.i4.5", 0x1B, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_6: OpCode = op("ldc.i4.6", 0x1C, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_7: OpCode = op("ldc.i4.7", 0x1D, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_8: OpCode = op("ldc.i4.8", 0x1E, NoOperand, Sequential, 0, 1);
    pub const LDC_I4_S: OpCode = op("ldc.i4.s", 0x1F, Int8, Sequential, 0, 1);
    pub const LDC_I4: OpCode = op("ldc.i4", 0x20, Int32, Sequential, 0, 1);
    pub const LDC_I8: OpCode = op("ldc.i8", 0x21, Int64, Sequential, 0, 1);
    pub const LDC_R4: OpCode = op("ldc.r4", 0x22, Float32, Sequential, 0, 1);
    pub const LDC_R8: OpCode = op("ldc.r8", 0x23, Float64, Sequential, 0, 1);

    // Stack manipulation
    pub const DUP: OpCode = op("dup", 0x25, NoOperand, Sequential, 1, 2);
    pub const POP: OpCode = op("pop", 0x26, NoOperand, Sequential, 1, 0);

    // Call / return
    pub const JMP: OpCode = op("jmp", 0x27, Token, UnconditionalBranch, 0, 0);
    pub const CALL: OpCode = op("call", 0x28, Token, Call, 0, 0);
    pub const CALLI: OpCode = op("calli", 0x29, Token, Call, 0, 0);
    pub const RET: OpCode = op("ret", 0x2A, NoOperand, Return, 0, 0);

    // Branch (short form)
    pub const BR_S: OpCode = op("br.s", 0x2B, Int8, UnconditionalBranch, 0, 0);
    pub const BRFALSE_S: OpCode = op("brfalse.s", 0x2C, Int8, ConditionalBranch, 1, 0);
    pub const BRTRUE_S: OpCode = op("brtrue.s", 0x2D, Int8, ConditionalBranch, 1, 0);
    pub const BEQ_S: OpCode = op("beq.s", 0x2E, Int8, ConditionalBranch, 2, 0);
    pub const BGE_S: OpCode = op("bge.s", 0x2F, Int8, ConditionalBranch, 2, 0);
    pub const BGT_S: OpCode = op("bgt.s", 0x30, Int8, ConditionalBranch, 2, 0);
    pub const BLE_S: OpCode = op("ble.s", 0x31, Int8, ConditionalBranch, 2, 0);
    pub const BLT_S: OpCode = op("blt.s", 0x32, Int8, ConditionalBranch, 2, 0);
    pub const BNE_UN_S: OpCode = op("bne.un.s", 0x33, Int8, ConditionalBranch, 2, 0);
    pub const BGE_UN_S: OpCode = op("bge.un.s", 0x34, Int8, ConditionalBranch, 2, 0);
    pub const BGT_UN_S: OpCode = op("bgt.un.s", 0x35, Int8, ConditionalBranch, 2, 0);
    pub const BLE_UN_S: OpCode = op("ble.un.s", 0x36, Int8, ConditionalBranch, 2, 0);
    pub const BLT_UN_S: OpCode = op("blt.un.s", 0x37, Int8, ConditionalBranch, 2, 0);

    // Branch (long form)
    pub const BR: OpCode = op("br", 0x38, Int32, UnconditionalBranch, 0, 0);
    pub const BRFALSE: OpCode = op("brfalse", 0x39, Int32, ConditionalBranch, 1, 0);
    pub const BRTRUE: OpCode = op("brtrue", 0x3A, Int32, ConditionalBranch, 1, 0);
    pub const BEQ: OpCode = op("beq", 0x3B, Int32, ConditionalBranch, 2, 0);
    pub const BGE: OpCode = op("bge", 0x3C, Int32, ConditionalBranch, 2, 0);
    pub const BGT: OpCode = op("bgt", 0x3D, Int32, ConditionalBranch, 2, 0);
    pub const BLE: OpCode = op("ble", 0x3E, Int32, ConditionalBranch, 2, 0);
    pub const BLT: OpCode = op("blt", 0x3F, Int32, ConditionalBranch, 2, 0);
    pub const BNE_UN: OpCode = op("bne.un", 0x40, Int32, ConditionalBranch, 2, 0);
    pub const BGE_UN: OpCode = op("bge.un", 0x41, Int32, ConditionalBranch, 2, 0);
    pub const BGT_UN: OpCode = op("bgt.un", 0x42, Int32, ConditionalBranch, 2, 0);
    pub const BLE_UN: OpCode = op("ble.un", 0x43, Int32, ConditionalBranch, 2, 0);
    pub const BLT_UN: OpCode = op("blt.un", 0x44, Int32, ConditionalBranch, 2, 0);

    // Switch
    pub const SWITCH: OpCode = op("switch", 0x45, SwitchOperand, SwitchFlow, 1, 0);

    // Indirect load (ldind.*)
    pub const LDIND_I1: OpCode = op("ldind.i1", 0x46, NoOperand, Sequential, 1, 1);
    pub const LDIND_U1: OpCode = op("ldind.u1", 0x47, NoOperand, Sequential, 1, 1);
    pub const LDIND_I2: OpCode = op("ldind.i2", 0x48, NoOperand, Sequential, 1, 1);
    pub const LDIND_U2: OpCode = op("ldind.u2", 0x49, NoOperand, Sequential, 1, 1);
    pub const LDIND_I4: OpCode = op("ldind.i4", 0x4A, NoOperand, Sequential, 1, 1);
    pub const LDIND_U4: OpCode = op("ldind.u4", 0x4B, NoOperand, Sequential, 1, 1);
    pub const LDIND_I8: OpCode = op("ldind.i8", 0x4C, NoOperand, Sequential, 1, 1);
    pub const LDIND_I: OpCode = op("ldind.i", 0x4D, NoOperand, Sequential, 1, 1);
    pub const LDIND_R4: OpCode = op("ldind.r4", 0x4E, NoOperand, Sequential, 1, 1);
    pub const LDIND_R8: OpCode = op("ldind.r8", 0x4F, NoOperand, Sequential, 1, 1);
    pub const LDIND_REF: OpCode = op("ldind.ref", 0x50, NoOperand, Sequential, 1, 1);

    // Indirect store (stind.*)
    pub const STIND_REF: OpCode = op("stind.ref", 0x51, NoOperand, Sequential, 2, 0);
    pub const STIND_I1: OpCode = op("stind.i1", 0x52, NoOperand, Sequential, 2, 0);
    pub const STIND_I2: OpCode = op("stind.i2", 0x53, NoOperand, Sequential, 2, 0);
    pub const STIND_I4: OpCode = op("stind.i4", 0x54, NoOperand, Sequential, 2, 0);
    pub const STIND_I8: OpCode = op("stind.i8", 0x55, NoOperand, Sequential, 2, 0);
    pub const STIND_R4: OpCode = op("stind.r4", 0x56, NoOperand, Sequential, 2, 0);
    pub const STIND_R8: OpCode = op("stind.r8", 0x57, NoOperand, Sequential, 2, 0);

    // Arithmetic
    pub const ADD: OpCode = op("add", 0x58, NoOperand, Sequential, 2, 1);
    pub const SUB: OpCode = op("sub", 0x59, NoOperand, Sequential, 2, 1);
    pub const MUL: OpCode = op("mul", 0x5A, NoOperand, Sequential, 2, 1);
    pub const DIV: OpCode = op("div", 0x5B, NoOperand, Sequential, 2, 1);
    pub const DIV_UN: OpCode = op("div.un", 0x5C, NoOperand, Sequential, 2, 1);
    pub const REM: OpCode = op("rem", 0x5D, NoOperand, Sequential, 2, 1);
    pub const REM_UN: OpCode = op("rem.un", 0x5E, NoOperand, Sequential, 2, 1);

    // Bitwise / logical
    pub const AND: OpCode = op("and", 0x5F, NoOperand, Sequential, 2, 1);
    pub const OR: OpCode = op("or", 0x60, NoOperand, Sequential, 2, 1);
    pub const XOR: OpCode = op("xor", 0x61, NoOperand, Sequential, 2, 1);
    pub const SHL: OpCode = op("shl", 0x62, NoOperand, Sequential, 2, 1);
    pub const SHR: OpCode = op("shr", 0x63, NoOperand, Sequential, 2, 1);
    pub const SHR_UN: OpCode = op("shr.un", 0x64, NoOperand, Sequential, 2, 1);
    pub const NEG: OpCode = op("neg", 0x65, NoOperand, Sequential, 1, 1);
    pub const NOT: OpCode = op("not", 0x66, NoOperand, Sequential, 1, 1);

    // Conversion
    pub const CONV_I1: OpCode = op("conv.i1", 0x67, NoOperand, Sequential, 1, 1);
    pub const CONV_I2: OpCode = op("conv.i2", 0x68, NoOperand, Sequential, 1, 1);
    pub const CONV_I4: OpCode = op("conv.i4", 0x69, NoOperand, Sequential, 1, 1);
    pub const CONV_I8: OpCode = op("conv.i8", 0x6A, NoOperand, Sequential, 1, 1);
    pub const CONV_R4: OpCode = op("conv.r4", 0x6B, NoOperand, Sequential, 1, 1);
    pub const CONV_R8: OpCode = op("conv.r8", 0x6C, NoOperand, Sequential, 1, 1);
    pub const CONV_U4: OpCode = op("conv.u4", 0x6D, NoOperand, Sequential, 1, 1);
    pub const CONV_U8: OpCode = op("conv.u8", 0x6E, NoOperand, Sequential, 1, 1);

    // Virtual call / object model
    pub const CALLVIRT: OpCode = op("callvirt", 0x6F, Token, Call, 0, 0);
    pub const CPOBJ: OpCode = op("cpobj", 0x70, Token, Sequential, 2, 0);
    pub const LDOBJ: OpCode = op("ldobj", 0x71, Token, Sequential, 1, 1);
    pub const LDSTR: OpCode = op("ldstr", 0x72, Token, Sequential, 0, 1);
    pub const NEWOBJ: OpCode = op("newobj", 0x73, Token, Call, 0, 1);
    pub const CASTCLASS: OpCode = op("castclass", 0x74, Token, Sequential, 1, 1);
    pub const ISINST: OpCode = op("isinst", 0x75, Token, Sequential, 1, 1);
    pub const CONV_R_UN: OpCode = op("conv.r.un", 0x76, NoOperand, Sequential, 1, 1);

    // Boxing / unboxing
    pub const UNBOX: OpCode = op("unbox", 0x79, Token, Sequential, 1, 1);

    // Exception
    pub const THROW: OpCode = op("throw", 0x7A, NoOperand, Throw, 1, 0);

    // Field access
    pub const LDFLD: OpCode = op("ldfld", 0x7B, Token, Sequential, 1, 1);
    pub const LDFLDA: OpCode = op("ldflda", 0x7C, Token, Sequential, 1, 1);
    pub const STFLD: OpCode = op("stfld", 0x7D, Token, Sequential, 2, 0);
    pub const LDSFLD: OpCode = op("ldsfld", 0x7E, Token, Sequential, 0, 1);
    pub const LDSFLDA: OpCode = op("ldsflda", 0x7F, Token, Sequential, 0, 1);
    pub const STSFLD: OpCode = op("stsfld", 0x80, Token, Sequential, 1, 0);

    // Object store
    pub const STOBJ: OpCode = op("stobj", 0x81, Token, Sequential, 2, 0);

    // Overflow conversion (unsigned source)
    pub const CONV_OVF_I1_UN: OpCode = op("conv.ovf.i1.un", 0x82, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I2_UN: OpCode = op("conv.ovf.i2.un", 0x83, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I4_UN: OpCode = op("conv.ovf.i4.un", 0x84, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I8_UN: OpCode = op("conv.ovf.i8.un", 0x85, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U1_UN: OpCode = op("conv.ovf.u1.un", 0x86, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U2_UN: OpCode = op("conv.ovf.u2.un", 0x87, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U4_UN: OpCode = op("conv.ovf.u4.un", 0x88, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U8_UN: OpCode = op("conv.ovf.u8.un", 0x89, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I_UN: OpCode = op("conv.ovf.i.un", 0x8A, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U_UN: OpCode = op("conv.ovf.u.un", 0x8B, NoOperand, Sequential, 1, 1);

    // Boxing / arrays
    pub const BOX: OpCode = op("box", 0x8C, Token, Sequential, 1, 1);
    pub const NEWARR: OpCode = op("newarr", 0x8D, Token, Sequential, 1, 1);
    pub const LDLEN: OpCode = op("ldlen", 0x8E, NoOperand, Sequential, 1, 1);
    pub const LDELEMA: OpCode = op("ldelema", 0x8F, Token, Sequential, 2, 1);

    // Array element load
    pub const LDELEM_I1: OpCode = op("ldelem.i1", 0x90, NoOperand, Sequential, 2, 1);
    pub const LDELEM_U1: OpCode = op("ldelem.u1", 0x91, NoOperand, Sequential, 2, 1);
    pub const LDELEM_I2: OpCode = op("ldelem.i2", 0x92, NoOperand, Sequential, 2, 1);
    pub const LDELEM_U2: OpCode = op("ldelem.u2", 0x93, NoOperand, Sequential, 2, 1);
    pub const LDELEM_I4: OpCode = op("ldelem.i4", 0x94, NoOperand, Sequential, 2, 1);
    pub const LDELEM_U4: OpCode = op("ldelem.u4", 0x95, NoOperand, Sequential, 2, 1);
    pub const LDELEM_I8: OpCode = op("ldelem.i8", 0x96, NoOperand, Sequential, 2, 1);
    pub const LDELEM_I: OpCode = op("ldelem.i", 0x97, NoOperand, Sequential, 2, 1);
    pub const LDELEM_R4: OpCode = op("ldelem.r4", 0x98, NoOperand, Sequential, 2, 1);
    pub const LDELEM_R8: OpCode = op("ldelem.r8", 0x99, NoOperand, Sequential, 2, 1);
    pub const LDELEM_REF: OpCode = op("ldelem.ref", 0x9A, NoOperand, Sequential, 2, 1);

    // Array element store
    pub const STELEM_I: OpCode = op("stelem.i", 0x9B, NoOperand, Sequential, 3, 0);
    pub const STELEM_I1: OpCode = op("stelem.i1", 0x9C, NoOperand, Sequential, 3, 0);
    pub const STELEM_I2: OpCode = op("stelem.i2", 0x9D, NoOperand, Sequential, 3, 0);
    pub const STELEM_I4: OpCode = op("stelem.i4", 0x9E, NoOperand, Sequential, 3, 0);
    pub const STELEM_I8: OpCode = op("stelem.i8", 0x9F, NoOperand, Sequential, 3, 0);
    pub const STELEM_R4: OpCode = op("stelem.r4", 0xA0, NoOperand, Sequential, 3, 0);
    pub const STELEM_R8: OpCode = op("stelem.r8", 0xA1, NoOperand, Sequential, 3, 0);
    pub const STELEM_REF: OpCode = op("stelem.ref", 0xA2, NoOperand, Sequential, 3, 0);

    // Generic array element access
    pub const LDELEM: OpCode = op("ldelem", 0xA3, Token, Sequential, 2, 1);
    pub const STELEM: OpCode = op("stelem", 0xA4, Token, Sequential, 3, 0);
    pub const UNBOX_ANY: OpCode = op("unbox.any", 0xA5, Token, Sequential, 1, 1);

    // Overflow conversion (signed source)
    pub const CONV_OVF_I1: OpCode = op("conv.ovf.i1", 0xB3, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U1: OpCode = op("conv.ovf.u1", 0xB4, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I2: OpCode = op("conv.ovf.i2", 0xB5, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U2: OpCode = op("conv.ovf.u2", 0xB6, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I4: OpCode = op("conv.ovf.i4", 0xB7, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U4: OpCode = op("conv.ovf.u4", 0xB8, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I8: OpCode = op("conv.ovf.i8", 0xB9, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U8: OpCode = op("conv.ovf.u8", 0xBA, NoOperand, Sequential, 1, 1);

    // Typed reference
    pub const REFANYVAL: OpCode = op("refanyval", 0xC2, Token, Sequential, 1, 1);
    pub const CKFINITE: OpCode = op("ckfinite", 0xC3, NoOperand, Sequential, 1, 1);
    pub const MKREFANY: OpCode = op("mkrefany", 0xC6, Token, Sequential, 1, 1);

    // Token / conversion
    pub const LDTOKEN: OpCode = op("ldtoken", 0xD0, Token, Sequential, 0, 1);
    pub const CONV_U2: OpCode = op("conv.u2", 0xD1, NoOperand, Sequential, 1, 1);
    pub const CONV_U1: OpCode = op("conv.u1", 0xD2, NoOperand, Sequential, 1, 1);
    pub const CONV_I: OpCode = op("conv.i", 0xD3, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_I: OpCode = op("conv.ovf.i", 0xD4, NoOperand, Sequential, 1, 1);
    pub const CONV_OVF_U: OpCode = op("conv.ovf.u", 0xD5, NoOperand, Sequential, 1, 1);

    // Overflow arithmetic
    pub const ADD_OVF: OpCode = op("add.ovf", 0xD6, NoOperand, Sequential, 2, 1);
    pub const ADD_OVF_UN: OpCode = op("add.ovf.un", 0xD7, NoOperand, Sequential, 2, 1);
    pub const MUL_OVF: OpCode = op("mul.ovf", 0xD8, NoOperand, Sequential, 2, 1);
    pub const MUL_OVF_UN: OpCode = op("mul.ovf.un", 0xD9, NoOperand, Sequential, 2, 1);
    pub const SUB_OVF: OpCode = op("sub.ovf", 0xDA, NoOperand, Sequential, 2, 1);
    pub const SUB_OVF_UN: OpCode = op("sub.ovf.un", 0xDB, NoOperand, Sequential, 2, 1);

    // Exception handling
    pub const ENDFINALLY: OpCode = op("endfinally", 0xDC, NoOperand, EndFinally, 0, 0);
    pub const LEAVE: OpCode = op("leave", 0xDD, Int32, Leave, 0, 0);
    pub const LEAVE_S: OpCode = op("leave.s", 0xDE, Int8, Leave, 0, 0);

    // Indirect store / conversion
    pub const STIND_I: OpCode = op("stind.i", 0xDF, NoOperand, Sequential, 2, 0);
    pub const CONV_U: OpCode = op("conv.u", 0xE0, NoOperand, Sequential, 1, 1);

    // ── Two-byte opcodes (0xFE prefix) ─────────────────────────────────────

    pub const ARGLIST: OpCode = op_fe("arglist", 0x00, NoOperand, Sequential, 0, 1);
    pub const CEQ: OpCode = op_fe("ceq", 0x01, NoOperand, Sequential, 2, 1);
    pub const CGT: OpCode = op_fe("cgt", 0x02, NoOperand, Sequential, 2, 1);
    pub const CGT_UN: OpCode = op_fe("cgt.un", 0x03, NoOperand, Sequential, 2, 1);
    pub const CLT: OpCode = op_fe("clt", 0x04, NoOperand, Sequential, 2, 1);
    pub const CLT_UN: OpCode = op_fe("clt.un", 0x05, NoOperand, Sequential, 2, 1);
    pub const LDFTN: OpCode = op_fe("ldftn", 0x06, Token, Sequential, 0, 1);
    pub const LDVIRTFTN: OpCode = op_fe("ldvirtftn", 0x07, Token, Sequential, 1, 1);
    pub const LDARG: OpCode = op_fe("ldarg", 0x09, UInt16, Sequential, 0, 1);
    pub const LDARGA: OpCode = op_fe("ldarga", 0x0A, UInt16, Sequential, 0, 1);
    pub const STARG: OpCode = op_fe("starg", 0x0B, UInt16, Sequential, 1, 0);
    pub const LDLOC: OpCode = op_fe("ldloc", 0x0C, UInt16, Sequential, 0, 1);
    pub const LDLOCA: OpCode = op_fe("ldloca", 0x0D, UInt16, Sequential, 0, 1);
    pub const STLOC: OpCode = op_fe("stloc", 0x0E, UInt16, Sequential, 1, 0);
    pub const LOCALLOC: OpCode = op_fe("localloc", 0x0F, NoOperand, Sequential, 1, 1);
    pub const ENDFILTER: OpCode = op_fe("endfilter", 0x11, NoOperand, EndFinally, 1, 0);
    pub const UNALIGNED: OpCode = op_fe("unaligned.", 0x12, UInt8, Sequential, 0, 0);
    pub const VOLATILE: OpCode = op_fe("volatile.", 0x13, NoOperand, Sequential, 0, 0);
    pub const TAIL: OpCode = op_fe("tail.", 0x14, NoOperand, Sequential, 0, 0);
    pub const INITOBJ: OpCode = op_fe("initobj", 0x15, Token, Sequential, 1, 0);
    pub const CONSTRAINED: OpCode = op_fe("constrained.", 0x16, Token, Sequential, 0, 0);
    pub const CPBLK: OpCode = op_fe("cpblk", 0x17, NoOperand, Sequential, 3, 0);
    pub const INITBLK: OpCode = op_fe("initblk", 0x18, NoOperand, Sequential, 3, 0);
    pub const RETHROW: OpCode = op_fe("rethrow", 0x1A, NoOperand, Throw, 0, 0);
    pub const SIZEOF: OpCode = op_fe("sizeof", 0x1C, Token, Sequential, 0, 1);
    pub const REFANYTYPE: OpCode = op_fe("refanytype", 0x1D, NoOperand, Sequential, 1, 1);
    pub const READONLY: OpCode = op_fe("readonly.", 0x1E, NoOperand, Sequential, 0, 0);
}

pub use table::*;
