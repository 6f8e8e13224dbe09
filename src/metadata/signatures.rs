//! Signature blob construction for .NET metadata.
//!
//! The define/intern surfaces of this crate accept signatures as opaque byte
//! blobs; this module provides the encoders that produce them according to the
//! ECMA-335 binary formats.
//!
//! # Available Encoders
//!
//! - [`method_signature`] - Method signatures for MethodDef and MemberRef rows
//! - [`field_signature`] - Field signatures for Field rows
//! - [`local_var_signature`] - Local variable signatures for StandAloneSig rows
//!
//! All three are built on [`encode_type_sig`], which writes a single
//! [`TypeSig`] element, and on the compressed unsigned-integer encoding used
//! throughout metadata blobs.
//!
//! ## Reference
//! * [ECMA-335 Partition II, Section 23.2](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Blobs and signatures

use crate::{metadata::token::Token, Error, Result};

#[allow(non_snake_case)]
/// Element type constants used in signature encoding (ECMA-335 §II.23.1.16)
pub mod ELEMENT_TYPE {
    /// void
    pub const VOID: u8 = 0x01;
    /// bool
    pub const BOOLEAN: u8 = 0x02;
    /// char
    pub const CHAR: u8 = 0x03;
    /// signed 8bit integer
    pub const I1: u8 = 0x04;
    /// unsigned 8bit integer
    pub const U1: u8 = 0x05;
    /// signed 16bit integer
    pub const I2: u8 = 0x06;
    /// unsigned 16bit integer
    pub const U2: u8 = 0x07;
    /// signed 32bit integer
    pub const I4: u8 = 0x08;
    /// unsigned 32bit integer
    pub const U4: u8 = 0x09;
    /// signed 64bit integer
    pub const I8: u8 = 0x0A;
    /// unsigned 64bit integer
    pub const U8: u8 = 0x0B;
    /// 32bit floating-point
    pub const R4: u8 = 0x0C;
    /// 64bit floating-point
    pub const R8: u8 = 0x0D;
    /// System.String
    pub const STRING: u8 = 0x0E;
    /// Unmanaged pointer, followed by a Type
    pub const PTR: u8 = 0x0F;
    /// Managed reference, followed by a Type
    pub const BYREF: u8 = 0x10;
    /// Value type, followed by a TypeDefOrRef coded index
    pub const VALUETYPE: u8 = 0x11;
    /// Class, followed by a TypeDefOrRef coded index
    pub const CLASS: u8 = 0x12;
    /// Generic type parameter, followed by an index
    pub const VAR: u8 = 0x13;
    /// native int
    pub const I: u8 = 0x18;
    /// native unsigned int
    pub const U: u8 = 0x19;
    /// System.Object
    pub const OBJECT: u8 = 0x1C;
    /// Single-dimension, zero-based array, followed by a Type
    pub const SZARRAY: u8 = 0x1D;
    /// Pinned local marker, followed by a Type
    pub const PINNED: u8 = 0x45;
}

#[allow(non_snake_case)]
/// Signature prolog bytes (ECMA-335 §II.23.2)
pub mod SIGNATURE_HEADER {
    /// Field signature prolog
    pub const FIELD: u8 = 0x06;
    /// Local variable signature prolog
    pub const LOCAL_SIG: u8 = 0x07;
    /// Property signature prolog
    pub const PROPERTY: u8 = 0x08;
}

#[allow(non_snake_case)]
/// Calling convention bits of a method signature's first byte (ECMA-335 §II.23.2.3)
pub mod CALLING_CONVENTION {
    /// Default managed calling convention
    pub const DEFAULT: u8 = 0x00;
    /// Unmanaged cdecl
    pub const C: u8 = 0x01;
    /// Unmanaged stdcall
    pub const STDCALL: u8 = 0x02;
    /// Unmanaged thiscall
    pub const THISCALL: u8 = 0x03;
    /// Unmanaged fastcall
    pub const FASTCALL: u8 = 0x04;
    /// Variable-argument managed convention
    pub const VARARG: u8 = 0x05;
    /// Method carries generic parameters
    pub const GENERIC: u8 = 0x10;
    /// Instance method (implicit this)
    pub const HASTHIS: u8 = 0x20;
    /// Instance method with explicit this parameter
    pub const EXPLICITTHIS: u8 = 0x40;
}

/// A type as it appears inside a signature blob.
///
/// This is the element-type subset a construction engine emits; composite
/// variants box their element type. `Class` and `ValueType` reference their
/// type through a metadata token, encoded as a TypeDefOrRef coded index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSig {
    /// void
    Void,
    /// bool
    Boolean,
    /// char
    Char,
    /// signed 8bit integer
    I1,
    /// unsigned 8bit integer
    U1,
    /// signed 16bit integer
    I2,
    /// unsigned 16bit integer
    U2,
    /// signed 32bit integer
    I4,
    /// unsigned 32bit integer
    U4,
    /// signed 64bit integer
    I8,
    /// unsigned 64bit integer
    U8,
    /// 32bit floating-point
    R4,
    /// 64bit floating-point
    R8,
    /// signed integer, sized to executing platform
    I,
    /// unsigned integer, sized to executing platform
    U,
    /// System.String
    String,
    /// System.Object
    Object,
    /// CIL class, referenced by token
    Class(Token),
    /// CIL value-type, referenced by token
    ValueType(Token),
    /// Generic type parameter of the declaring type, by index
    GenericParam(u32),
    /// Unmanaged pointer to a type
    Ptr(Box<TypeSig>),
    /// Managed reference to a type
    ByRef(Box<TypeSig>),
    /// Single-dimension, zero-based array of a type
    SzArray(Box<TypeSig>),
    /// Pinned local variable slot
    Pinned(Box<TypeSig>),
}

/// A method signature prior to blob encoding.
///
/// The default value describes `static void ()` with the default managed
/// calling convention.
#[derive(Debug, Clone, Default)]
pub struct MethodSig {
    /// Instance method (implicit this parameter)
    pub has_this: bool,
    /// Instance method with explicit this parameter
    pub explicit_this: bool,
    /// Variable-argument calling convention
    pub vararg: bool,
    /// Number of generic parameters (0 for non-generic methods)
    pub generic_param_count: u32,
    /// Return type
    pub return_type: Option<TypeSig>,
    /// Parameter types, in declaration order
    pub params: Vec<TypeSig>,
}

/// Writes a compressed unsigned integer according to ECMA-335 §II.23.2.
///
/// Values below `0x80` take one byte, below `0x4000` two bytes with the high
/// bit set, and everything else four bytes with the top two bits set. Callers
/// must stay below `0x2000_0000`, the largest value the format can represent;
/// every count and coded index this crate produces is bounded well under that.
pub fn write_compressed_uint(value: u32, buffer: &mut Vec<u8>) {
    if value < 0x80 {
        buffer.push(value as u8);
    } else if value < 0x4000 {
        buffer.push(0x80 | (value >> 8) as u8);
        buffer.push(value as u8);
    } else {
        buffer.push(0xC0 | (value >> 24) as u8);
        buffer.push((value >> 16) as u8);
        buffer.push((value >> 8) as u8);
        buffer.push(value as u8);
    }
}

/// Encodes a token as a TypeDefOrRef coded index according to ECMA-335 §II.24.2.6.
///
/// - TypeDef (0x02): `(rid << 2) | 0`
/// - TypeRef (0x01): `(rid << 2) | 1`
/// - TypeSpec (0x1B): `(rid << 2) | 2`
///
/// # Errors
///
/// Returns [`Error::InvalidSignature`] if the token's table is not one of the
/// three tables a TypeDefOrRef coded index can reference.
pub fn encode_type_def_or_ref_coded_index(token: Token) -> Result<u32> {
    let rid = token.row();

    match token.table() {
        0x02 => Ok(rid << 2),       // TypeDef
        0x01 => Ok((rid << 2) | 1), // TypeRef
        0x1B => Ok((rid << 2) | 2), // TypeSpec
        table => Err(Error::InvalidSignature(format!(
            "Invalid token table 0x{:02X} for TypeDefOrRef coded index. \
            Expected TypeDef (0x02), TypeRef (0x01), or TypeSpec (0x1B). Token: 0x{:08X}",
            table,
            token.value()
        ))),
    }
}

/// Encodes a single type element into `buffer` according to ECMA-335 §II.23.2.12.
///
/// # Errors
///
/// Returns an error if a `Class`/`ValueType` token cannot form a TypeDefOrRef
/// coded index.
pub fn encode_type_sig(sig: &TypeSig, buffer: &mut Vec<u8>) -> Result<()> {
    match sig {
        TypeSig::Void => buffer.push(ELEMENT_TYPE::VOID),
        TypeSig::Boolean => buffer.push(ELEMENT_TYPE::BOOLEAN),
        TypeSig::Char => buffer.push(ELEMENT_TYPE::CHAR),
        TypeSig::I1 => buffer.push(ELEMENT_TYPE::I1),
        TypeSig::U1 => buffer.push(ELEMENT_TYPE::U1),
        TypeSig::I2 => buffer.push(ELEMENT_TYPE::I2),
        TypeSig::U2 => buffer.push(ELEMENT_TYPE::U2),
        TypeSig::I4 => buffer.push(ELEMENT_TYPE::I4),
        TypeSig::U4 => buffer.push(ELEMENT_TYPE::U4),
        TypeSig::I8 => buffer.push(ELEMENT_TYPE::I8),
        TypeSig::U8 => buffer.push(ELEMENT_TYPE::U8),
        TypeSig::R4 => buffer.push(ELEMENT_TYPE::R4),
        TypeSig::R8 => buffer.push(ELEMENT_TYPE::R8),
        TypeSig::I => buffer.push(ELEMENT_TYPE::I),
        TypeSig::U => buffer.push(ELEMENT_TYPE::U),
        TypeSig::String => buffer.push(ELEMENT_TYPE::STRING),
        TypeSig::Object => buffer.push(ELEMENT_TYPE::OBJECT),
        TypeSig::Class(token) => {
            buffer.push(ELEMENT_TYPE::CLASS);
            write_compressed_uint(encode_type_def_or_ref_coded_index(*token)?, buffer);
        }
        TypeSig::ValueType(token) => {
            buffer.push(ELEMENT_TYPE::VALUETYPE);
            write_compressed_uint(encode_type_def_or_ref_coded_index(*token)?, buffer);
        }
        TypeSig::GenericParam(index) => {
            buffer.push(ELEMENT_TYPE::VAR);
            write_compressed_uint(*index, buffer);
        }
        TypeSig::Ptr(inner) => {
            buffer.push(ELEMENT_TYPE::PTR);
            encode_type_sig(inner, buffer)?;
        }
        TypeSig::ByRef(inner) => {
            buffer.push(ELEMENT_TYPE::BYREF);
            encode_type_sig(inner, buffer)?;
        }
        TypeSig::SzArray(inner) => {
            buffer.push(ELEMENT_TYPE::SZARRAY);
            encode_type_sig(inner, buffer)?;
        }
        TypeSig::Pinned(inner) => {
            buffer.push(ELEMENT_TYPE::PINNED);
            encode_type_sig(inner, buffer)?;
        }
    }
    Ok(())
}

/// Encodes a method signature blob according to ECMA-335 §II.23.2.1.
///
/// Layout: calling convention byte, generic parameter count (when generic),
/// parameter count, return type, parameter types. A `None` return type encodes
/// as `void`.
///
/// # Errors
///
/// Returns an error if any contained type fails to encode.
///
/// # Examples
///
/// ```rust
/// use cilforge::metadata::signatures::{method_signature, MethodSig, TypeSig};
///
/// let blob = method_signature(&MethodSig {
///     has_this: true,
///     params: vec![TypeSig::I4],
///     ..Default::default()
/// })?;
/// assert_eq!(blob, [0x20, 0x01, 0x01, 0x08]);
/// # Ok::<(), cilforge::Error>(())
/// ```
pub fn method_signature(signature: &MethodSig) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    let mut calling_convention = if signature.vararg {
        CALLING_CONVENTION::VARARG
    } else {
        CALLING_CONVENTION::DEFAULT
    };
    if signature.has_this {
        calling_convention |= CALLING_CONVENTION::HASTHIS;
    }
    if signature.explicit_this {
        calling_convention |= CALLING_CONVENTION::EXPLICITTHIS;
    }
    if signature.generic_param_count > 0 {
        calling_convention |= CALLING_CONVENTION::GENERIC;
    }
    buffer.push(calling_convention);

    if signature.generic_param_count > 0 {
        write_compressed_uint(signature.generic_param_count, &mut buffer);
    }

    let param_count = u32::try_from(signature.params.len()).map_err(|_| {
        Error::InvalidSignature(format!(
            "Too many parameters in method signature: {}",
            signature.params.len()
        ))
    })?;
    write_compressed_uint(param_count, &mut buffer);

    match &signature.return_type {
        Some(return_type) => encode_type_sig(return_type, &mut buffer)?,
        None => buffer.push(ELEMENT_TYPE::VOID),
    }
    for param in &signature.params {
        encode_type_sig(param, &mut buffer)?;
    }

    Ok(buffer)
}

/// Encodes a field signature blob according to ECMA-335 §II.23.2.4.
///
/// Layout: field prolog (`0x06`) followed by the field type.
///
/// # Errors
///
/// Returns an error if the field type fails to encode.
pub fn field_signature(field_type: &TypeSig) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    buffer.push(SIGNATURE_HEADER::FIELD);
    encode_type_sig(field_type, &mut buffer)?;

    Ok(buffer)
}

/// Encodes a local variable signature blob according to ECMA-335 §II.23.2.6.
///
/// Layout: local prolog (`0x07`), slot count, one type per slot. Pinned and
/// by-reference slots are expressed through [`TypeSig::Pinned`] and
/// [`TypeSig::ByRef`].
///
/// # Errors
///
/// Returns an error if any slot type fails to encode.
pub fn local_var_signature(locals: &[TypeSig]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();

    buffer.push(SIGNATURE_HEADER::LOCAL_SIG);

    let count = u32::try_from(locals.len()).map_err(|_| {
        Error::InvalidSignature(format!("Too many local variables: {}", locals.len()))
    })?;
    write_compressed_uint(count, &mut buffer);

    for local in locals {
        encode_type_sig(local, &mut buffer)?;
    }

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tables::TableId;

    #[test]
    fn compressed_uint_boundaries() {
        let mut buffer = Vec::new();
        write_compressed_uint(0x03, &mut buffer);
        assert_eq!(buffer, [0x03]);

        buffer.clear();
        write_compressed_uint(0x7F, &mut buffer);
        assert_eq!(buffer, [0x7F]);

        buffer.clear();
        write_compressed_uint(0x80, &mut buffer);
        assert_eq!(buffer, [0x80, 0x80]);

        buffer.clear();
        write_compressed_uint(0x3FFF, &mut buffer);
        assert_eq!(buffer, [0xBF, 0xFF]);

        buffer.clear();
        write_compressed_uint(0x4000, &mut buffer);
        assert_eq!(buffer, [0xC0, 0x00, 0x40, 0x00]);
    }

    #[test]
    fn coded_index_tags() {
        let typedef = Token::from_parts(TableId::TypeDef, 2);
        assert_eq!(encode_type_def_or_ref_coded_index(typedef).unwrap(), 0x08);

        let typeref = Token::from_parts(TableId::TypeRef, 1);
        assert_eq!(encode_type_def_or_ref_coded_index(typeref).unwrap(), 0x05);

        let field = Token::from_parts(TableId::Field, 1);
        assert!(encode_type_def_or_ref_coded_index(field).is_err());
    }

    #[test]
    fn static_void_signature() {
        let blob = method_signature(&MethodSig::default()).unwrap();
        assert_eq!(blob, [CALLING_CONVENTION::DEFAULT, 0x00, ELEMENT_TYPE::VOID]);
    }

    #[test]
    fn instance_signature_with_params() {
        let blob = method_signature(&MethodSig {
            has_this: true,
            return_type: Some(TypeSig::String),
            params: vec![TypeSig::I4, TypeSig::Object],
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            blob,
            [
                CALLING_CONVENTION::HASTHIS,
                0x02,
                ELEMENT_TYPE::STRING,
                ELEMENT_TYPE::I4,
                ELEMENT_TYPE::OBJECT
            ]
        );
    }

    #[test]
    fn generic_method_signature() {
        let blob = method_signature(&MethodSig {
            generic_param_count: 1,
            return_type: Some(TypeSig::GenericParam(0)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(blob, [0x10, 0x01, 0x00, ELEMENT_TYPE::VAR, 0x00]);
    }

    #[test]
    fn field_signature_class_reference() {
        let token = Token::from_parts(TableId::TypeRef, 3);
        let blob = field_signature(&TypeSig::Class(token)).unwrap();
        assert_eq!(
            blob,
            [SIGNATURE_HEADER::FIELD, ELEMENT_TYPE::CLASS, (3 << 2) | 1]
        );
    }

    #[test]
    fn local_signature_slots() {
        let blob = local_var_signature(&[
            TypeSig::I4,
            TypeSig::Pinned(Box::new(TypeSig::SzArray(Box::new(TypeSig::U1)))),
        ])
        .unwrap();
        assert_eq!(
            blob,
            [
                SIGNATURE_HEADER::LOCAL_SIG,
                0x02,
                ELEMENT_TYPE::I4,
                ELEMENT_TYPE::PINNED,
                ELEMENT_TYPE::SZARRAY,
                ELEMENT_TYPE::U1
            ]
        );
    }

    #[test]
    fn nested_composite_types() {
        let mut buffer = Vec::new();
        encode_type_sig(
            &TypeSig::ByRef(Box::new(TypeSig::SzArray(Box::new(TypeSig::R8)))),
            &mut buffer,
        )
        .unwrap();
        assert_eq!(
            buffer,
            [ELEMENT_TYPE::BYREF, ELEMENT_TYPE::SZARRAY, ELEMENT_TYPE::R8]
        );
    }
}
