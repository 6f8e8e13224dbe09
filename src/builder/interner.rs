//! Content-based token interning for strings, blobs, and external references.
//!
//! Builder handles carry their identity already, so interning them is a
//! lookup on the handle itself. Everything else a method body can reference
//! is interned here by content: user strings into an ECMA-335 `#US` heap
//! image, signature blobs into `StandAloneSig` rows, and external type and
//! member references into `TypeRef`/`MemberRef` rows. Equal content always
//! yields the identical token.

use std::collections::HashMap;

use widestring::U16String;

use crate::{
    metadata::{signatures::write_compressed_uint, tables::TableId, token::Token},
    Error, Result,
};

/// Computes the trailing byte of a `#US` heap entry.
///
/// The byte is 1 when any code unit carries a set bit in its high byte or a
/// low byte from the ranges ECMA-335 singles out, and 0 otherwise.
fn user_string_terminal(units: &[u16]) -> u8 {
    let special = units.iter().any(|&unit| {
        let low = (unit & 0xFF) as u8;
        unit >> 8 != 0 || matches!(low, 0x01..=0x08 | 0x0E..=0x1F | 0x27 | 0x2D | 0x7F)
    });
    u8::from(special)
}

/// Deduplicating token table for content-identified entities.
///
/// Lives inside the container state and is always accessed under the
/// container lock. Row counters for each table start at 1 and stay within
/// the 23-bit row space shared with the pending partition.
#[derive(Debug)]
pub(crate) struct TokenInterner {
    strings: HashMap<String, Token>,
    user_strings: Vec<u8>,
    blobs: HashMap<Vec<u8>, Token>,
    next_signature_row: u32,
    type_refs: HashMap<(String, String), Token>,
    next_type_ref_row: u32,
    member_refs: HashMap<(Token, String, Vec<u8>), Token>,
    next_member_ref_row: u32,
}

impl TokenInterner {
    pub(crate) fn new() -> Self {
        TokenInterner {
            strings: HashMap::new(),
            // the #US heap begins with a single zero byte
            user_strings: vec![0],
            blobs: HashMap::new(),
            next_signature_row: 1,
            type_refs: HashMap::new(),
            next_type_ref_row: 1,
            member_refs: HashMap::new(),
            next_member_ref_row: 1,
        }
    }

    fn take_row(next: &mut u32, table: TableId) -> Result<u32> {
        let row = *next;
        if row > Token::MAX_ROW {
            return Err(Error::TokenOverflow(table as u8));
        }
        *next = row + 1;
        Ok(row)
    }

    /// Interns `value` into the `#US` heap and returns its string token.
    ///
    /// The token's row part is the entry's byte offset in the heap, the
    /// addressing scheme `ldstr` uses. The empty string is a legal entry.
    pub(crate) fn intern_string(&mut self, value: &str) -> Result<Token> {
        if let Some(token) = self.strings.get(value) {
            return Ok(*token);
        }

        let offset = self.user_strings.len() as u32;
        if offset > Token::MAX_ROW {
            return Err(Error::TokenOverflow(TableId::UserString as u8));
        }

        let units = U16String::from_str(value).into_vec();
        let byte_len = u32::try_from(units.len() * 2 + 1)
            .map_err(|_| Error::TokenOverflow(TableId::UserString as u8))?;
        write_compressed_uint(byte_len, &mut self.user_strings);
        for unit in &units {
            self.user_strings.extend_from_slice(&unit.to_le_bytes());
        }
        self.user_strings.push(user_string_terminal(&units));

        let token = Token::from_parts(TableId::UserString, offset);
        self.strings.insert(value.to_string(), token);
        Ok(token)
    }

    /// Interns an opaque signature blob into the `StandAloneSig` table.
    pub(crate) fn intern_blob(&mut self, blob: &[u8]) -> Result<Token> {
        if blob.is_empty() {
            return Err(Error::EmptyEntity("signature blob"));
        }
        if let Some(token) = self.blobs.get(blob) {
            return Ok(*token);
        }

        let row = Self::take_row(&mut self.next_signature_row, TableId::StandAloneSig)?;
        let token = Token::from_parts(TableId::StandAloneSig, row);
        self.blobs.insert(blob.to_vec(), token);
        Ok(token)
    }

    /// Interns an external type reference by `(namespace, name)` content.
    pub(crate) fn intern_type_ref(&mut self, namespace: &str, name: &str) -> Result<Token> {
        if name.is_empty() {
            return Err(Error::EmptyEntity("type name"));
        }
        let key = (namespace.to_string(), name.to_string());
        if let Some(token) = self.type_refs.get(&key) {
            return Ok(*token);
        }

        let row = Self::take_row(&mut self.next_type_ref_row, TableId::TypeRef)?;
        let token = Token::from_parts(TableId::TypeRef, row);
        self.type_refs.insert(key, token);
        Ok(token)
    }

    /// Interns an external member reference by `(parent, name, signature)`
    /// content.
    pub(crate) fn intern_member_ref(
        &mut self,
        parent: Token,
        name: &str,
        signature: &[u8],
    ) -> Result<Token> {
        if name.is_empty() {
            return Err(Error::EmptyEntity("member name"));
        }
        if signature.is_empty() {
            return Err(Error::EmptyEntity("member signature"));
        }
        let key = (parent, name.to_string(), signature.to_vec());
        if let Some(token) = self.member_refs.get(&key) {
            return Ok(*token);
        }

        let row = Self::take_row(&mut self.next_member_ref_row, TableId::MemberRef)?;
        let token = Token::from_parts(TableId::MemberRef, row);
        self.member_refs.insert(key, token);
        Ok(token)
    }

    /// Current `#US` heap image.
    pub(crate) fn user_string_heap(&self) -> &[u8] {
        &self.user_strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_string_content_yields_one_token() {
        let mut interner = TokenInterner::new();
        let first = interner.intern_string("hello").unwrap();
        let second = interner.intern_string("hello").unwrap();
        let other = interner.intern_string("world").unwrap();

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert_eq!(first.table(), TableId::UserString as u8);
    }

    #[test]
    fn user_string_heap_layout() {
        let mut interner = TokenInterner::new();
        let token = interner.intern_string("Hi").unwrap();

        // heap: [0], then at offset 1: length 5, 'H', 'i' as UTF-16LE, terminal 0
        assert_eq!(token.row(), 1);
        let heap = interner.user_string_heap();
        assert_eq!(
            heap,
            &[0x00, 0x05, b'H', 0x00, b'i', 0x00, 0x00]
        );
    }

    #[test]
    fn wide_characters_set_the_terminal_byte() {
        let mut interner = TokenInterner::new();
        interner.intern_string("\u{1F600}").unwrap();

        // surrogate pair: 4 content bytes plus the terminal byte
        let heap = interner.user_string_heap();
        assert_eq!(heap[1], 0x05);
        assert_eq!(heap[6], 0x01);
    }

    #[test]
    fn empty_string_is_a_legal_entry() {
        let mut interner = TokenInterner::new();
        let token = interner.intern_string("").unwrap();
        assert_eq!(token.row(), 1);
        assert_eq!(interner.user_string_heap(), &[0x00, 0x01, 0x00]);
    }

    #[test]
    fn blob_rows_are_content_deduplicated() {
        let mut interner = TokenInterner::new();
        let first = interner.intern_blob(&[0x07, 0x01, 0x08]).unwrap();
        let again = interner.intern_blob(&[0x07, 0x01, 0x08]).unwrap();
        let other = interner.intern_blob(&[0x06, 0x0E]).unwrap();

        assert_eq!(first, again);
        assert_eq!(first.row(), 1);
        assert_eq!(other.row(), 2);
        assert_eq!(other.table(), TableId::StandAloneSig as u8);
    }

    #[test]
    fn empty_blob_is_rejected() {
        let mut interner = TokenInterner::new();
        assert!(matches!(
            interner.intern_blob(&[]),
            Err(Error::EmptyEntity("signature blob"))
        ));
    }

    #[test]
    fn type_refs_dedup_by_namespace_and_name() {
        let mut interner = TokenInterner::new();
        let object = interner.intern_type_ref("System", "Object").unwrap();
        let again = interner.intern_type_ref("System", "Object").unwrap();
        let exception = interner.intern_type_ref("System", "Exception").unwrap();
        let global = interner.intern_type_ref("", "Object").unwrap();

        assert_eq!(object, again);
        assert_ne!(object, exception);
        assert_ne!(object, global);
        assert_eq!(object.table(), TableId::TypeRef as u8);
        assert!(matches!(
            interner.intern_type_ref("System", ""),
            Err(Error::EmptyEntity("type name"))
        ));
    }

    #[test]
    fn member_refs_dedup_by_full_content() {
        let mut interner = TokenInterner::new();
        let parent = Token::from_parts(TableId::TypeRef, 1);
        let sig = [0x20, 0x00, 0x01];

        let ctor = interner.intern_member_ref(parent, ".ctor", &sig).unwrap();
        let again = interner.intern_member_ref(parent, ".ctor", &sig).unwrap();
        let other_parent = interner
            .intern_member_ref(Token::from_parts(TableId::TypeRef, 2), ".ctor", &sig)
            .unwrap();

        assert_eq!(ctor, again);
        assert_ne!(ctor, other_parent);
        assert_eq!(ctor.table(), TableId::MemberRef as u8);
    }
}
