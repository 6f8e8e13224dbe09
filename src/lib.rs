// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]

//! # cilforge
//!
//! [![Crates.io](https://img.shields.io/crates/v/cilforge.svg)](https://crates.io/crates/cilforge)
//! [![Documentation](https://docs.rs/cilforge/badge.svg)](https://docs.rs/cilforge)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/cilforge/blob/main/LICENSE-APACHE)
//!
//! A thread-safe, cross-platform engine for constructing .NET types and assembling CIL
//! (Common Intermediate Language) method bodies at runtime. Built in pure Rust, `cilforge`
//! provides Reflection.Emit-style dynamic code generation without requiring Windows or the
//! .NET runtime: types, methods, fields, and generic parameters are defined against
//! provisional identities, method bodies are assembled in a single pass, and a final commit
//! resolves every forward reference and hands the encoded bodies to the caller.
//!
//! ## Features
//!
//! - **🏗️ Complete type construction** - Define types, methods, fields, and generic
//!   parameters with forward references between them, in any order
//! - **⚡ Single-pass IL assembly** - Labels and fixups, automatic short/long branch
//!   selection, conservative evaluation-stack depth tracking
//! - **🛡️ Structured exception regions** - try/catch/filter/finally/fault layout with
//!   innermost-first clause ordering and implicit region exits
//! - **🔄 Deferred token resolution** - Emit calls to methods that do not exist yet;
//!   commit patches every pending operand to its final token
//! - **📦 ECMA-335 faithful encoding** - Tiny and fat body headers, exception handling
//!   sections, `#US` heap images, compressed signature blobs
//! - **🔧 Cross-platform** - Works on Windows, Linux, macOS, and any Rust-supported platform
//!
//! ## Quick Start
//!
//! Add `cilforge` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! cilforge = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! For convenient access to the most commonly used types, import the prelude:
//!
//! ```rust
//! use cilforge::prelude::*;
//!
//! // Define a type with one static method
//! let module = ModuleBuilder::new("dynamic");
//! let magic = module.define_type("Magic", TypeAttributes::PUBLIC, None, &[])?;
//! let answer_sig = method_signature(&MethodSig {
//!     return_type: Some(TypeSig::I4),
//!     ..MethodSig::default()
//! })?;
//! let answer = module.define_method(
//!     &magic,
//!     "Answer",
//!     MethodAttributes::PUBLIC | MethodAttributes::STATIC,
//!     &answer_sig,
//! )?;
//!
//! // Assemble its body
//! let mut il = module.il_stream(&answer)?;
//! il.emit_i1(&opcodes::LDC_I4_S, 42)?;
//! il.emit(&opcodes::RET)?;
//! module.bake(&answer, il)?;
//!
//! // Freeze the type and collect the encoded bodies
//! module.create_type(&magic)?;
//! let mut bodies = Vec::new();
//! module.commit(&mut |method: Token, body: &[u8]| {
//!     bodies.push((method, body.to_vec()));
//!     Ok(())
//! })?;
//! assert_eq!(bodies.len(), 1);
//! # Ok::<(), cilforge::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `cilforge` is organized into several key modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types and traits
//! - [`builder`] - Type construction containers, handles, and created snapshots
//! - [`emit`] - The IL assembler, instruction table, and method body encoding
//! - [`metadata`] - Tokens, table identifiers, and signature blob construction
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ### The Builder Lifecycle
//!
//! [`ModuleBuilder`] is the main entry point. Every entity moves through the same
//! three stages:
//!
//! 1. **Define** reserves a provisional token and returns an opaque handle, so
//!    entities can reference each other before any of them is finalized.
//! 2. **Create** freezes a type together with its members, assigns final tokens in
//!    creation order, and publishes immutable snapshots.
//! 3. **Commit** patches pending tokens inside every baked body and streams the
//!    encoded results to a [`BodySink`], exactly once per container.
//!
//! ### The Assembly Engine
//!
//! The [`emit`] module provides:
//!
//! - **Instruction Emission**: Operand-checked emission over the full CIL opcode table
//! - **Branch Resolution**: Forward and backward branches through [`Label`], with
//!   automatic short-form upgrades at emission time
//! - **Stack Tracking**: A conservative `max_stack` bound without control flow analysis
//! - **Exception Regions**: Nested protected region tracking with ECMA-335 clause output
//!
//! ## Standards Compliance
//!
//! `cilforge` implements the **ECMA-335 specification** (6th edition) for the Common
//! Language Infrastructure. Method body framing, exception handling sections, metadata
//! tokens, and signature blobs conform to this standard.
//!
//! ### References
//!
//! - [ECMA-335 Standard](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Official CLI specification
//! - [.NET Runtime](https://github.com/dotnet/runtime) - Microsoft's reference implementation
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with comprehensive error information:
//!
//! ```rust
//! use cilforge::{opcodes, Error, IlAssembler};
//!
//! let mut il = IlAssembler::new();
//! let exit = il.define_label();
//! il.emit_branch(&opcodes::BR_S, exit)?;
//!
//! match il.bake() {
//!     Ok(body) => println!("assembled {} bytes", body.code.len()),
//!     Err(Error::UnresolvedLabel(label)) => println!("never marked: {label}"),
//!     Err(e) => println!("other failure: {e}"),
//! }
//! # Ok::<(), cilforge::Error>(())
//! ```
//!
//! ## Testing
//!
//! The test suite asserts byte-exact encodings against hand-computed ECMA-335 layouts:
//!
//! ```bash
//! cargo test
//! cargo bench  # Criterion benchmarks for assembly throughput
//! ```
#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// This module provides a curated selection of the most frequently used types
/// from across the cilforge library, allowing for convenient glob imports.
///
/// # Example
///
/// ```rust
/// use cilforge::prelude::*;
///
/// let module = ModuleBuilder::new("scratch");
/// let widget = module.define_type("Widget", TypeAttributes::PUBLIC, None, &[])?;
/// let token = module.create_type(&widget)?;
/// assert_eq!(token.table(), TableId::TypeDef as u8);
/// # Ok::<(), cilforge::Error>(())
/// ```
pub mod prelude;

/// Dynamic construction of types, members, and their tokens.
///
/// This module implements the define/create/commit lifecycle for runtime type
/// construction. It provides:
///
/// - **Containers**: [`builder::ModuleBuilder`] owns every builder and issues
///   opaque, container-scoped handles
/// - **Entities**: types, methods, fields, and generic parameters, each with
///   ECMA-335 attribute flags
/// - **Token Interning**: string literals, standalone signatures, and external
///   type/member references with stable, deduplicated tokens
/// - **Persistence**: the [`builder::BodySink`] trait receiving encoded bodies
///   at commit
///
/// # Key Types
///
/// - [`builder::ModuleBuilder`] - The construction container
/// - [`builder::TypeHandle`] / [`builder::MethodHandle`] - Opaque builder handles
/// - [`builder::TypeInfo`] / [`builder::MethodInfo`] - Immutable created snapshots
/// - [`builder::BodySink`] - Commit-time persistence boundary
pub mod builder;

/// CIL instruction assembly and method body encoding.
///
/// This module implements single-pass IL assembly. It provides:
///
/// - **Instruction Emission**: operand-width-checked emission over the CIL
///   opcode table in [`emit::opcodes`]
/// - **Branch Resolution**: [`emit::Label`] targets with deferred fixups and
///   automatic short-form handling
/// - **Stack Tracking**: conservative `max_stack` computation
/// - **Exception Regions**: nested try/catch/filter/finally/fault tracking
/// - **Body Encoding**: [`emit::MethodBody::encode`] produces the ECMA-335
///   binary framing, tiny or fat
///
/// # Example
///
/// ```rust
/// use cilforge::{opcodes, IlAssembler};
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
pub mod emit;

/// Metadata tokens, table identifiers, and signature blobs based on ECMA-335.
///
/// This module provides the identity layer underneath construction and
/// assembly:
///
/// - [`metadata::token::Token`] - Packed table/row references, including the
///   pending form used for forward references
/// - [`metadata::tables::TableId`] - The metadata tables this engine writes
/// - [`metadata::signatures`] - Compressed method, field, and local-variable
///   signature blobs
pub mod metadata;

/// `cilforge` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`]. This is used consistently throughout the crate for all fallible
/// operations.
///
/// # Examples
///
/// ```rust
/// use cilforge::{IlAssembler, MethodBody, Result};
///
/// fn assemble_empty() -> Result<MethodBody> {
///     let mut il = IlAssembler::new();
///     il.emit(&cilforge::opcodes::RET)?;
///     il.bake()
/// }
/// # assemble_empty().unwrap();
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `cilforge` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for assembly, construction sequencing, and token resolution failures.
///
/// # Examples
///
/// ```rust
/// use cilforge::{
///     builder::{ModuleBuilder, TypeAttributes},
///     Error,
/// };
///
/// let module = ModuleBuilder::new("app");
/// match module.define_type("", TypeAttributes::empty(), None, &[]) {
///     Err(Error::EmptyEntity(what)) => println!("missing: {what}"),
///     other => println!("unexpected: {other:?}"),
/// }
/// ```
pub use error::Error;

/// Main entry point for constructing types and method bodies at runtime.
///
/// See [`builder::ModuleBuilder`] for the define/create/commit lifecycle.
///
/// # Example
///
/// ```rust
/// use cilforge::{builder::TypeAttributes, ModuleBuilder};
///
/// let module = ModuleBuilder::new("app");
/// let widget = module.define_type("Widget", TypeAttributes::PUBLIC, None, &[])?;
/// assert_eq!(module.create_type(&widget)?.value(), 0x0200_0001);
/// # Ok::<(), cilforge::Error>(())
/// ```
pub use builder::{BodySink, ModuleBuilder};

/// Single-pass CIL assembler and its baked output.
///
/// [`IlAssembler`] accumulates instructions, labels, locals, and protected
/// regions; [`MethodBody`] is the immutable result of its one-shot bake.
/// [`Label`] names a branch target within one assembler.
pub use emit::{IlAssembler, Label, MethodBody};

/// The CIL instruction table.
///
/// One [`emit::OpCode`] constant per instruction, named after its mnemonic.
///
/// # Example
///
/// ```rust
/// use cilforge::opcodes;
///
/// assert_eq!(opcodes::RET.mnemonic, "ret");
/// assert_eq!(opcodes::ADD.pops, 2);
/// ```
pub use emit::opcodes;

/// Metadata token type for referencing table entries.
///
/// # Example
///
/// ```rust
/// use cilforge::{metadata::tables::TableId, Token};
///
/// let token = Token::from_parts(TableId::MethodDef, 1);
/// assert_eq!(token.value(), 0x0600_0001);
/// assert!(!token.is_pending());
/// ```
pub use metadata::token::Token;
