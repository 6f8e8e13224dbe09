//! Baked method bodies and their binary framing.
//!
//! [`MethodBody`] is the immutable product of a bake: the final instruction
//! bytes, the computed stack bound, the frozen local-variable signature, the
//! sorted exception clause table, and the list of operand positions whose
//! tokens were still pending when the body was emitted.
//!
//! [`MethodBody::encode`] serializes the body in the ECMA-335 method body
//! format: a one-byte tiny header when the body qualifies, a 12-byte fat
//! header otherwise, followed by the code and an optional fat exception
//! handling section aligned to a 4-byte boundary. Exception clauses are
//! always written in the fat 24-byte form.

use crate::{
    emit::{
        regions::{ClauseFlags, ExceptionClause},
        stream::CodeStream,
    },
    metadata::token::Token,
    Error, Result,
};
use bitflags::bitflags;

bitflags! {
    /// Method body header flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodBodyFlags: u16 {
        /// Tiny method header format
        const TINY_FORMAT = 0x2;
        /// Fat method header format
        const FAT_FORMAT = 0x3;
        /// Flag of the fat method header, showing that there are more data sections appended to the header
        const MORE_SECTS = 0x8;
        /// Flag to indicate that this method should call the default constructor on all local variables
        const INIT_LOCALS = 0x10;
    }
}

bitflags! {
    /// Flags that a method body section can have.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SectionFlags: u8 {
        /// Indicates that this section contains exception handling data
        const EHTABLE = 0x1;
        /// Reserved, shall be 0
        const OPT_ILTABLE = 0x2;
        /// Indicates that the data section format is fat
        const FAT_FORMAT = 0x40;
        /// Indicates that the data section is followed by another one
        const MORE_SECTS = 0x80;
    }
}

/// Size in bytes of the fat method body header.
const FAT_HEADER_SIZE: u16 = 12;
/// Size in bytes of one fat exception handling clause.
const FAT_CLAUSE_SIZE: u32 = 24;
/// Size in bytes of one tiny exception handling clause.
const TINY_CLAUSE_SIZE: u32 = 12;
/// Upper limit on code size for the tiny header format.
const TINY_CODE_LIMIT: usize = 64;
/// Implicit `max_stack` of tiny-format bodies.
const TINY_MAX_STACK: u16 = 8;

/// A code position holding a placeholder token for a builder that was not
/// yet created when the instruction was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenRelocation {
    /// Byte offset of the 4-byte token operand inside the code
    pub offset: u32,
    /// The pending token that was written there
    pub token: Token,
}

/// An immutable, fully resolved method body.
///
/// Produced exactly once per instruction stream by
/// [`IlAssembler::bake`](crate::emit::IlAssembler::bake). Branch operands are
/// final; token operands listed in `relocations` still carry pending values
/// and are rewritten during [`MethodBody::encode`].
#[derive(Debug, Clone)]
pub struct MethodBody {
    /// Final instruction bytes with all branch displacements patched.
    pub code: Vec<u8>,
    /// Conservative peak evaluation-stack depth.
    pub max_stack: u16,
    /// `LOCAL_SIG` signature blob covering the declared locals, if any.
    pub local_signature: Option<Vec<u8>>,
    /// Exception handling clauses, innermost first.
    pub exception_clauses: Vec<ExceptionClause>,
    /// Code positions whose tokens await final identities.
    pub relocations: Vec<TokenRelocation>,
}

impl MethodBody {
    /// Returns true if the body fits the one-byte tiny header: short code,
    /// default stack bound, no locals, and no exception clauses.
    #[must_use]
    pub fn is_tiny(&self) -> bool {
        self.code.len() < TINY_CODE_LIMIT
            && self.max_stack <= TINY_MAX_STACK
            && self.local_signature.is_none()
            && self.exception_clauses.is_empty()
    }

    /// Serializes the body in the ECMA-335 method body format.
    ///
    /// `local_sig_token` is the `StandAloneSig` token interned for
    /// [`local_signature`](MethodBody::local_signature); bodies without
    /// locals pass `None`. `resolve` maps each pending token to its final
    /// identity and is consulted for every entry in
    /// [`relocations`](MethodBody::relocations) and for pending catch-type
    /// tokens in the exception table.
    ///
    /// # Errors
    ///
    /// Propagates resolver failures, typically [`Error::StillPending`] when a
    /// referenced builder was never created.
    pub fn encode<F>(&self, local_sig_token: Option<Token>, mut resolve: F) -> Result<Vec<u8>>
    where
        F: FnMut(Token) -> Result<Token>,
    {
        let mut code = self.code.clone();
        for relocation in &self.relocations {
            let resolved = resolve(relocation.token)?;
            let offset = relocation.offset as usize;
            let window = code
                .get_mut(offset..offset + 4)
                .ok_or(Error::OutOfBounds)?;
            window.copy_from_slice(&resolved.value().to_le_bytes());
        }

        if self.is_tiny() && local_sig_token.is_none() {
            let mut out = Vec::with_capacity(1 + code.len());
            out.push((code.len() as u8) << 2 | MethodBodyFlags::TINY_FORMAT.bits() as u8);
            out.extend_from_slice(&code);
            return Ok(out);
        }

        let mut flags = MethodBodyFlags::FAT_FORMAT;
        if local_sig_token.is_some() {
            flags |= MethodBodyFlags::INIT_LOCALS;
        }
        if !self.exception_clauses.is_empty() {
            flags |= MethodBodyFlags::MORE_SECTS;
        }

        let mut out = CodeStream::new();
        // Header size is expressed in dwords in the upper 4 bits
        out.put_u16(flags.bits() | (FAT_HEADER_SIZE / 4) << 12);
        out.put_u16(self.max_stack);
        out.put_u32(code.len() as u32);
        out.put_u32(local_sig_token.map_or(0, |token| token.value()));
        for byte in &code {
            out.put_u8(*byte);
        }

        if !self.exception_clauses.is_empty() {
            while out.len() % 4 != 0 {
                out.put_u8(0);
            }
            let tiny_section = self.tiny_section_fits();
            if tiny_section {
                let section = SectionFlags::EHTABLE;
                let data_size = self.exception_clauses.len() as u32 * TINY_CLAUSE_SIZE + 4;
                out.put_u8(section.bits());
                out.put_u8(data_size as u8);
                out.put_u16(0);
            } else {
                let section = SectionFlags::EHTABLE | SectionFlags::FAT_FORMAT;
                let data_size = self.exception_clauses.len() as u32 * FAT_CLAUSE_SIZE + 4;
                out.put_u32(u32::from(section.bits()) | data_size << 8);
            }
            for clause in &self.exception_clauses {
                if tiny_section {
                    out.put_u16(clause.flags.bits() as u16);
                    out.put_u16(clause.try_offset as u16);
                    out.put_u8(clause.try_length as u8);
                    out.put_u16(clause.handler_offset as u16);
                    out.put_u8(clause.handler_length as u8);
                } else {
                    out.put_u32(clause.flags.bits());
                    out.put_u32(clause.try_offset);
                    out.put_u32(clause.try_length);
                    out.put_u32(clause.handler_offset);
                    out.put_u32(clause.handler_length);
                }
                if clause.flags == ClauseFlags::FILTER {
                    out.put_u32(clause.filter_offset);
                } else {
                    let class_token = match clause.class_token {
                        Some(token) if token.is_pending() => resolve(token)?,
                        Some(token) => token,
                        None => Token::new(0),
                    };
                    out.put_u32(class_token.value());
                }
            }
        }
        Ok(out.into_bytes())
    }

    /// True when every clause fits the tiny 12-byte encoding and the section
    /// length fits its one-byte size field.
    fn tiny_section_fits(&self) -> bool {
        self.exception_clauses.len() as u32 * TINY_CLAUSE_SIZE + 4 <= u8::MAX as u32
            && self.exception_clauses.iter().all(|clause| {
                clause.try_offset <= u16::MAX as u32
                    && clause.try_length <= u8::MAX as u32
                    && clause.handler_offset <= u16::MAX as u32
                    && clause.handler_length <= u8::MAX as u32
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(code: Vec<u8>, max_stack: u16) -> MethodBody {
        MethodBody {
            code,
            max_stack,
            local_signature: None,
            exception_clauses: Vec::new(),
            relocations: Vec::new(),
        }
    }

    fn keep(token: Token) -> Result<Token> {
        Ok(token)
    }

    #[test]
    fn tiny_header_packs_length() {
        let body = body(vec![0x16, 0x2A], 1);
        assert!(body.is_tiny());
        let bytes = body.encode(None, keep).unwrap();
        assert_eq!(bytes, vec![0x0A, 0x16, 0x2A]);
    }

    #[test]
    fn long_code_forces_fat_header() {
        let mut code = vec![0x00; 63];
        code.push(0x2A);
        let body = body(code, 1);
        assert!(!body.is_tiny());
        let bytes = body.encode(None, keep).unwrap();
        assert_eq!(bytes.len(), 76);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x3003);
        assert_eq!(
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            64
        );
        assert_eq!(bytes[75], 0x2A);
    }

    #[test]
    fn deep_stack_forces_fat_header() {
        let body = body(vec![0x2A], 9);
        assert!(!body.is_tiny());
        let bytes = body.encode(None, keep).unwrap();
        assert_eq!(bytes.len(), 13);
        assert_eq!(u16::from_le_bytes([bytes[0], bytes[1]]), 0x3003);
        assert_eq!(u16::from_le_bytes([bytes[2], bytes[3]]), 9);
        assert_eq!(
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            1
        );
        assert_eq!(
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            0
        );
        assert_eq!(bytes[12], 0x2A);
    }

    #[test]
    fn local_signature_token_lands_in_header() {
        let mut body = body(vec![0x2A], 1);
        body.local_signature = Some(vec![0x07, 0x01, 0x08]);
        let token = Token::new(0x1100_0001);
        let bytes = body.encode(Some(token), keep).unwrap();
        let header = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(
            header & 0xFFF,
            (MethodBodyFlags::FAT_FORMAT | MethodBodyFlags::INIT_LOCALS).bits()
        );
        assert_eq!(
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            0x1100_0001
        );
    }

    fn finally_clause(handler_length: u32) -> ExceptionClause {
        ExceptionClause {
            flags: ClauseFlags::FINALLY,
            try_offset: 0,
            try_length: 3,
            handler_offset: 3,
            handler_length,
            class_token: None,
            filter_offset: 0,
        }
    }

    #[test]
    fn small_clauses_use_the_tiny_section() {
        let mut body = body(vec![0x00; 6], 1);
        body.exception_clauses.push(finally_clause(3));
        let bytes = body.encode(None, keep).unwrap();

        // 12-byte header + 6 code bytes, padded to 20 for the section
        let section_start = 20;
        assert_eq!(bytes[18], 0);
        assert_eq!(bytes[19], 0);
        assert_eq!(bytes[section_start], SectionFlags::EHTABLE.bits());
        assert_eq!(bytes[section_start + 1], 16);
        assert_eq!(
            u16::from_le_bytes([bytes[section_start + 4], bytes[section_start + 5]]),
            ClauseFlags::FINALLY.bits() as u16
        );
        assert_eq!(bytes[section_start + 8], 3);
        assert_eq!(bytes.len(), section_start + 4 + 12);
    }

    #[test]
    fn oversized_clause_forces_the_fat_section() {
        let mut body = body(vec![0x00; 6], 1);
        body.exception_clauses.push(finally_clause(0x100));
        let bytes = body.encode(None, keep).unwrap();

        let section_start = 20;
        let section_header = u32::from_le_bytes([
            bytes[section_start],
            bytes[section_start + 1],
            bytes[section_start + 2],
            bytes[section_start + 3],
        ]);
        assert_eq!(section_header & 0xFF, 0x41);
        assert_eq!(section_header >> 8, 28);
        let clause_flags = u32::from_le_bytes([
            bytes[section_start + 4],
            bytes[section_start + 5],
            bytes[section_start + 6],
            bytes[section_start + 7],
        ]);
        assert_eq!(clause_flags, ClauseFlags::FINALLY.bits());
        assert_eq!(bytes.len(), section_start + 4 + 24);
    }

    #[test]
    fn relocations_are_patched_through_resolver() {
        let pending = Token::pending(crate::metadata::tables::TableId::MethodDef, 3);
        let mut code = vec![0x28];
        code.extend_from_slice(&pending.value().to_le_bytes());
        code.push(0x2A);

        let mut body = body(code, 1);
        body.relocations.push(TokenRelocation {
            offset: 1,
            token: pending,
        });
        let final_token = Token::new(0x0600_0007);
        let bytes = body
            .encode(None, |token| {
                assert_eq!(token, pending);
                Ok(final_token)
            })
            .unwrap();
        assert_eq!(&bytes[2..6], &0x0600_0007_u32.to_le_bytes());
    }

    #[test]
    fn relocation_offset_must_fit_the_code() {
        let mut body = body(vec![0x2A], 1);
        body.relocations.push(TokenRelocation {
            offset: 40,
            token: Token::pending(crate::metadata::tables::TableId::Field, 0),
        });
        assert!(matches!(body.encode(None, keep), Err(Error::OutOfBounds)));
    }
}
