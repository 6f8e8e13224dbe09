//! Type builder handles and attributes.

use std::sync::Arc;

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// Type attributes as defined by ECMA-335 §II.23.1.15.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeAttributes: u32 {
        /// Type is not visible outside its assembly
        const NOT_PUBLIC = 0x0000_0000;
        /// Type is visible outside its assembly
        const PUBLIC = 0x0000_0001;
        /// Fields are laid out sequentially
        const SEQUENTIAL_LAYOUT = 0x0000_0008;
        /// Field layout is specified explicitly
        const EXPLICIT_LAYOUT = 0x0000_0010;
        /// Type is an interface
        const INTERFACE = 0x0000_0020;
        /// Type cannot be instantiated
        const ABSTRACT = 0x0000_0080;
        /// Type cannot be extended
        const SEALED = 0x0000_0100;
        /// Name is special, per its naming convention
        const SPECIAL_NAME = 0x0000_0400;
        /// CLI provides special behavior, depending upon the name
        const RT_SPECIAL_NAME = 0x0000_0800;
        /// Static field initialization is deferred until first access
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// Opaque handle to a type under construction.
///
/// Issued by [`crate::builder::ModuleBuilder::define_type`] and accepted only
/// by the container that issued it. The handle stays valid for the lifetime
/// of the container; once the type is created it continues to identify the
/// type but no longer permits mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeHandle {
    pub(crate) container: u32,
    pub(crate) token: Token,
}

/// A finalized type as published in the container's created registry.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Final token of the type
    pub token: Token,
    /// Type name, unique within the container
    pub name: String,
    /// Attribute flags
    pub attributes: TypeAttributes,
    /// Resolved parent token, if the type extends one
    pub parent: Option<Token>,
    /// Resolved interface tokens
    pub interfaces: Vec<Token>,
    /// Final tokens of the type's generic parameters, in declaration order
    pub generic_params: Vec<Token>,
    /// Final tokens of the type's methods, in definition order
    pub methods: Vec<Token>,
    /// Final tokens of the type's fields, in definition order
    pub fields: Vec<Token>,
}

/// Member token list of one pending type, append-only and shared.
pub(crate) type MemberList = Arc<boxcar::Vec<Token>>;

/// Container-side record of a type between define and create.
#[derive(Debug)]
pub(crate) struct PendingType {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) attributes: TypeAttributes,
    pub(crate) parent: Option<Token>,
    pub(crate) interfaces: Vec<Token>,
    pub(crate) generics: MemberList,
    pub(crate) methods: MemberList,
    pub(crate) fields: MemberList,
    pub(crate) created: Option<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_match_the_standard() {
        assert_eq!(TypeAttributes::PUBLIC.bits(), 0x0000_0001);
        assert_eq!(TypeAttributes::INTERFACE.bits(), 0x0000_0020);
        assert_eq!(TypeAttributes::ABSTRACT.bits(), 0x0000_0080);
        assert_eq!(TypeAttributes::SEALED.bits(), 0x0000_0100);
        assert_eq!(TypeAttributes::BEFORE_FIELD_INIT.bits(), 0x0010_0000);

        let interface =
            TypeAttributes::PUBLIC | TypeAttributes::INTERFACE | TypeAttributes::ABSTRACT;
        assert_eq!(interface.bits(), 0x0000_00A1);
    }
}
