//! Field builder handles and attributes.

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// Field attributes as defined by ECMA-335 §II.23.1.5.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAttributes: u32 {
        /// Member not referenceable
        const COMPILER_CONTROLLED = 0x0000;
        /// Accessible only by the parent type
        const PRIVATE = 0x0001;
        /// Accessible by sub-types only in this assembly
        const FAM_AND_ASSEM = 0x0002;
        /// Accessible by anyone in the assembly
        const ASSEM = 0x0003;
        /// Accessible only by type and sub-types
        const FAMILY = 0x0004;
        /// Accessible by sub-types anywhere, plus anyone in assembly
        const FAM_OR_ASSEM = 0x0005;
        /// Accessible by anyone who has visibility to this scope
        const PUBLIC = 0x0006;
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Field can only be initialized, not written after init
        const INIT_ONLY = 0x0020;
        /// Value is a compile-time constant
        const LITERAL = 0x0040;
        /// Field does not have to be serialized when the type is remoted
        const NOT_SERIALIZED = 0x0080;
        /// Field is special
        const SPECIAL_NAME = 0x0200;
        /// CLI provides special behavior, depending upon the name
        const RT_SPECIAL_NAME = 0x0400;
    }
}

/// Opaque handle to a field under construction.
///
/// Issued by [`crate::builder::ModuleBuilder::define_field`], scoped to the
/// declaring type's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHandle {
    pub(crate) container: u32,
    pub(crate) token: Token,
}

/// A finalized field as published in the container's created registry.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Final token of the field
    pub token: Token,
    /// Final token of the declaring type
    pub declaring_type: Token,
    /// Field name
    pub name: String,
    /// Attribute flags
    pub attributes: FieldAttributes,
    /// Field signature blob
    pub signature: Vec<u8>,
}

/// Container-side record of a field between define and create.
#[derive(Debug)]
pub(crate) struct PendingField {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) attributes: FieldAttributes,
    pub(crate) signature: Vec<u8>,
    pub(crate) created: Option<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_match_the_standard() {
        assert_eq!(FieldAttributes::PUBLIC.bits(), 0x0006);
        assert_eq!(FieldAttributes::STATIC.bits(), 0x0010);
        assert_eq!(FieldAttributes::INIT_ONLY.bits(), 0x0020);
        assert_eq!(FieldAttributes::LITERAL.bits(), 0x0040);
    }
}
