//! Method builder handles and attributes.

use std::sync::Arc;

use bitflags::bitflags;

use crate::{emit::MethodBody, metadata::token::Token};

bitflags! {
    /// Method attributes as defined by ECMA-335 §II.23.1.10.
    ///
    /// The low three bits form the access field; its named values are listed
    /// individually the way the standard enumerates them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAttributes: u32 {
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
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method always gets a new slot in the vtable
        const NEW_SLOT = 0x0100;
        /// Method can only be overridden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides special behavior, depending upon the name
        const RT_SPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
    }
}

/// Opaque handle to a method under construction.
///
/// Issued by [`crate::builder::ModuleBuilder::define_method`], scoped to the
/// declaring type's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodHandle {
    pub(crate) container: u32,
    pub(crate) token: Token,
}

/// A finalized method as published in the container's created registry.
#[derive(Debug, Clone)]
pub struct MethodInfo {
    /// Final token of the method
    pub token: Token,
    /// Final token of the declaring type
    pub declaring_type: Token,
    /// Method name
    pub name: String,
    /// Attribute flags
    pub attributes: MethodAttributes,
    /// Method signature blob
    pub signature: Vec<u8>,
    /// Baked body, absent for body-less methods
    pub body: Option<Arc<MethodBody>>,
}

/// Body-stream lifecycle of one pending method.
#[derive(Debug)]
pub(crate) enum StreamState {
    /// No body stream requested yet
    NotIssued,
    /// An assembler with this stream id is out with the caller
    Issued(u32),
    /// The body was handed back and baked
    Baked(Arc<MethodBody>),
}

/// Container-side record of a method between define and create.
#[derive(Debug)]
pub(crate) struct PendingMethod {
    pub(crate) token: Token,
    pub(crate) name: String,
    pub(crate) attributes: MethodAttributes,
    pub(crate) signature: Vec<u8>,
    pub(crate) stream: StreamState,
    pub(crate) created: Option<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_bits_match_the_standard() {
        assert_eq!(MethodAttributes::PUBLIC.bits(), 0x0006);
        assert_eq!(MethodAttributes::STATIC.bits(), 0x0010);
        assert_eq!(MethodAttributes::VIRTUAL.bits(), 0x0040);
        assert_eq!(MethodAttributes::HIDE_BY_SIG.bits(), 0x0080);
        assert_eq!(MethodAttributes::RT_SPECIAL_NAME.bits(), 0x1000);

        let ctor = MethodAttributes::PUBLIC
            | MethodAttributes::HIDE_BY_SIG
            | MethodAttributes::SPECIAL_NAME
            | MethodAttributes::RT_SPECIAL_NAME;
        assert_eq!(ctor.bits(), 0x1886);
    }
}
