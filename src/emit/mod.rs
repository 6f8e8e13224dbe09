//! CIL instruction emission and method body construction.
//!
//! This module is the low-level half of the crate: it turns sequences of
//! ECMA-335 instructions into finished method bodies, byte for byte, without
//! knowing anything about the types and members those bodies belong to.
//!
//! # Key components
//!
//! - [`IlAssembler`] - per-method emission state: instruction stream, labels,
//!   stack-depth simulation, and protected-region tracking
//! - [`opcodes`] - the ECMA-335 instruction table with per-instruction
//!   operand kind, control flow class, and static stack effect
//! - [`MethodBody`] - the immutable result of a bake: code bytes, stack
//!   bound, local signature, exception clauses, and pending-token
//!   relocations
//! - [`CodeStream`] - the little-endian byte buffer underneath it all
//!
//! Emission is mechanical: operand widths and structural rules (label
//! ownership, region nesting, branch reachability) are enforced, while
//! semantic validity of the instruction sequence is the caller's business.
//!
//! # Examples
//!
//! ```rust
//! use cilforge::emit::{opcodes, IlAssembler};
//!
//! // static int Max(int a, int b) => a > b ? a : b;
//! let mut il = IlAssembler::new();
//! let pick_b = il.define_label();
//! il.emit(&opcodes::LDARG_0)?;
//! il.emit(&opcodes::LDARG_1)?;
//! il.emit_branch(&opcodes::BLE_S, pick_b)?;
//! il.emit(&opcodes::LDARG_0)?;
//! il.emit(&opcodes::RET)?;
//! il.mark_label(pick_b)?;
//! il.emit(&opcodes::LDARG_1)?;
//! il.emit(&opcodes::RET)?;
//!
//! let body = il.bake()?;
//! assert_eq!(body.max_stack, 2);
//! assert!(body.exception_clauses.is_empty());
//! # Ok::<(), cilforge::Error>(())
//! ```

mod assembler;
mod body;
mod labels;
pub mod opcodes;
mod regions;
mod stack;
mod stream;

pub use assembler::IlAssembler;
pub use body::{MethodBody, MethodBodyFlags, SectionFlags, TokenRelocation};
pub use labels::Label;
pub use opcodes::{FlowKind, OpCode, OperandKind};
pub use regions::{ClauseFlags, ExceptionClause};
pub use stream::CodeStream;
