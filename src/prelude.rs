//! # cilforge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the cilforge library. Import this module to get quick access to the essential
//! types for dynamic type construction and IL assembly.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all cilforge operations
pub use crate::Error;

/// The result type used throughout cilforge
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Container for dynamically constructed types and method bodies
pub use crate::builder::ModuleBuilder;

/// Persistence boundary receiving encoded method bodies at commit
pub use crate::builder::BodySink;

// ================================================================================================
// Type Construction
// ================================================================================================

/// Opaque handles issued by the container for entities under construction
pub use crate::builder::{FieldHandle, GenericParamHandle, MethodHandle, TypeHandle};

/// Immutable snapshots of created entities
pub use crate::builder::{FieldInfo, GenericParamInfo, MethodInfo, TypeInfo};

/// ECMA-335 attribute flags for defined entities
pub use crate::builder::{
    FieldAttributes, GenericParamAttributes, MethodAttributes, TypeAttributes,
};

// ================================================================================================
// IL Assembly
// ================================================================================================

/// Single-pass CIL instruction assembler
pub use crate::emit::IlAssembler;

/// Branch target within one assembler's instruction stream
pub use crate::emit::Label;

/// Baked method bodies and their binary framing
pub use crate::emit::{MethodBody, MethodBodyFlags, TokenRelocation};

/// Exception handling clauses produced by protected regions
pub use crate::emit::{ClauseFlags, ExceptionClause};

/// The CIL instruction table, one constant per mnemonic
pub use crate::emit::opcodes;

/// Instruction descriptors backing the opcode table
pub use crate::emit::{FlowKind, OpCode, OperandKind};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Identifiers of the metadata tables this engine writes
pub use crate::metadata::tables::TableId;

/// Signature blob construction for methods, fields, and locals
pub use crate::metadata::signatures::{
    field_signature, local_var_signature, method_signature, MethodSig, TypeSig,
};
