//! Generic parameter sub-builders.
//!
//! Generic parameters belong to a type builder and are created recursively
//! when the owning type is created. Until then their constraints may
//! reference pending types, exactly like a parent or interface reference.

use bitflags::bitflags;

use crate::metadata::token::Token;

bitflags! {
    /// Generic parameter attributes as defined by ECMA-335 §II.23.1.7.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct GenericParamAttributes: u32 {
        /// Parameter is covariant
        const COVARIANT = 0x0001;
        /// Parameter is contravariant
        const CONTRAVARIANT = 0x0002;
        /// Parameter is constrained to reference types
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        /// Parameter is constrained to non-nullable value types
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        /// Parameter must have a public parameterless constructor
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}

/// Opaque handle to a generic parameter under construction.
///
/// Issued by [`crate::builder::ModuleBuilder::define_generic_params`] in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenericParamHandle {
    pub(crate) container: u32,
    pub(crate) token: Token,
}

/// A finalized generic parameter as published in the container's created
/// registry.
#[derive(Debug, Clone)]
pub struct GenericParamInfo {
    /// Final token of the generic parameter
    pub token: Token,
    /// Final token of the owning type
    pub owner: Token,
    /// Zero-based position within the owner's parameter list
    pub number: u16,
    /// Parameter name
    pub name: String,
    /// Variance and constraint flags
    pub attributes: GenericParamAttributes,
    /// Resolved constraint type tokens
    pub constraints: Vec<Token>,
}

/// Container-side record of a generic parameter between define and create.
#[derive(Debug)]
pub(crate) struct PendingGenericParam {
    pub(crate) token: Token,
    pub(crate) number: u16,
    pub(crate) name: String,
    pub(crate) attributes: GenericParamAttributes,
    pub(crate) constraints: Vec<Token>,
    pub(crate) created: Option<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_match_the_standard() {
        assert_eq!(GenericParamAttributes::COVARIANT.bits(), 0x0001);
        assert_eq!(GenericParamAttributes::CONTRAVARIANT.bits(), 0x0002);
        assert_eq!(
            GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT.bits(),
            0x0010
        );
    }
}
