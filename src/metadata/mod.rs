//! Metadata identity and signature primitives for dynamic construction.
//!
//! This module contains the identity layer the construction engine builds on:
//! tokens, the table tags they index, and the signature blob encoders backing
//! every define/intern surface of the crate.
//!
//! # Key Components
//!
//! - [`token`] - Metadata table row references, including the pending-row
//!   partition used for builders that are not yet created
//! - [`tables`] - Tags of the tables this engine issues tokens into
//! - [`signatures`] - Method, field, and local-variable signature blob
//!   construction
//!
//! # Examples
//!
//! ```rust
//! use cilforge::metadata::signatures::{method_signature, MethodSig, TypeSig};
//! use cilforge::metadata::tables::TableId;
//! use cilforge::metadata::token::Token;
//!
//! let token = Token::from_parts(TableId::MethodDef, 1);
//! assert_eq!(token.value(), 0x0600_0001);
//!
//! let blob = method_signature(&MethodSig {
//!     return_type: Some(TypeSig::I4),
//!     ..Default::default()
//! })?;
//! assert_eq!(blob, [0x00, 0x00, 0x08]);
//! # Ok::<(), cilforge::Error>(())
//! ```

/// Implementation of signature blob encoding
pub mod signatures;
/// Implementation of metadata table identifiers
pub mod tables;
/// Implementation of metadata tokens
pub mod token;
