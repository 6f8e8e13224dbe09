use std::fmt;
use std::hash::{Hash, Hasher};

use crate::metadata::tables::TableId;

/// A metadata token identifying an entity within one container.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
///
/// This engine partitions the 24-bit row space: rows with bit 23 set are
/// *pending* rows, indexing the container's pending-builder list instead of a
/// final table row. Pending tokens are written into instruction streams as
/// opaque placeholders and patched to final tokens during commit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Row bit marking a token as pending (builder not yet created).
    pub const PENDING_BIT: u32 = 0x0080_0000;

    /// Largest row index either partition can hold.
    pub const MAX_ROW: u32 = 0x007F_FFFF;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a final token for `table` with the given row index.
    #[must_use]
    pub fn from_parts(table: TableId, row: u32) -> Self {
        Token(((table as u32) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a pending token for `table` indexing the container's pending list.
    #[must_use]
    pub fn pending(table: TableId, index: u32) -> Self {
        Token(((table as u32) << 24) | Self::PENDING_BIT | (index & Self::MAX_ROW))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this token's row lies in the pending partition
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0 & Self::PENDING_BIT != 0
    }

    /// Returns the index into the pending-builder list for a pending token
    #[must_use]
    pub fn pending_index(&self) -> u32 {
        self.0 & Self::MAX_ROW
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {}{})",
            self.0,
            self.table(),
            self.row() & Self::MAX_ROW,
            if self.is_pending() { ", pending" } else { "" }
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_token_parts() {
        let token = Token::from_parts(TableId::MethodDef, 1);
        assert_eq!(token.value(), 0x0600_0001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);
        assert!(!token.is_pending());
        assert!(!token.is_null());
    }

    #[test]
    fn test_token_pending_partition() {
        let token = Token::pending(TableId::TypeDef, 3);
        assert_eq!(token.table(), 0x02);
        assert!(token.is_pending());
        assert_eq!(token.pending_index(), 3);

        let final_token = Token::from_parts(TableId::TypeDef, 3);
        assert!(!final_token.is_pending());
        assert_ne!(token, final_token);
    }

    #[test]
    fn test_token_pending_boundaries() {
        let top = Token::pending(TableId::Field, Token::MAX_ROW);
        assert_eq!(top.pending_index(), Token::MAX_ROW);
        assert!(top.is_pending());

        let bottom = Token::pending(TableId::Field, 0);
        assert_eq!(bottom.pending_index(), 0);
        assert!(bottom.is_pending());
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0x0000_0000).is_null());
        assert!(!Token(0x0600_0001).is_null());
    }

    #[test]
    fn test_token_from_conversion() {
        let value = 0x0600_0001u32;
        let token: Token = value.into();
        assert_eq!(token.value(), value);

        let back_to_u32: u32 = token.into();
        assert_eq!(back_to_u32, value);
    }

    #[test]
    fn test_token_display() {
        assert_eq!(format!("{}", Token(0x0600_0001)), "0x06000001");
        assert_eq!(format!("{}", Token(0x7000_002a)), "0x7000002a");
    }

    #[test]
    fn test_token_debug() {
        let debug_str = format!("{:?}", Token::pending(TableId::MethodDef, 1));
        assert!(debug_str.contains("table: 0x06"));
        assert!(debug_str.contains("pending"));

        let debug_str = format!("{:?}", Token(0x0600_0001));
        assert!(debug_str.contains("row: 1"));
        assert!(!debug_str.contains("pending"));
    }

    #[test]
    fn test_token_ordering_and_hash() {
        let token1 = Token(0x0600_0001);
        let token2 = Token(0x0600_0002);
        let token3 = Token(0x0700_0001);

        assert!(token1 < token2);
        assert!(token2 < token3);

        let mut map = HashMap::new();
        map.insert(token1, "bump");
        map.insert(token2, "reset");
        assert_eq!(map.get(&token1), Some(&"bump"));
        assert_eq!(map.get(&token2), Some(&"reset"));
    }
}
