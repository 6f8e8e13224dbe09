use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Identifiers for the metadata tables this engine issues tokens into.
///
/// Each variant carries the table tag defined by ECMA-335; a [`crate::metadata::token::Token`]
/// is formed by placing the tag in the high byte above a 24-bit row index. Only the
/// tables a construction container allocates or references appear here; a full
/// metadata reader tracks many more.
///
/// ## Reference
/// * [ECMA-335 Partition II, Section 22](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf) - Metadata Tables
#[derive(Clone, Copy, PartialEq, Debug, EnumIter, EnumCount, Eq, Hash)]
pub enum TableId {
    /// `TypeRef` table (0x01) - References to types defined in external assemblies.
    ///
    /// Interned by namespace/name content so repeated references to the same
    /// external type collapse to one row.
    TypeRef = 0x01,

    /// `TypeDef` table (0x02) - Types defined by builders in this container.
    TypeDef = 0x02,

    /// `Field` table (0x04) - Fields defined by builders in this container.
    Field = 0x04,

    /// `MethodDef` table (0x06) - Methods defined by builders in this container.
    MethodDef = 0x06,

    /// `MemberRef` table (0x0A) - References to members of external types.
    ///
    /// Interned by (parent, name, signature) content.
    MemberRef = 0x0A,

    /// `StandAloneSig` table (0x11) - Standalone signature blobs.
    ///
    /// Holds local-variable signatures and any opaque signature blob interned
    /// by content.
    StandAloneSig = 0x11,

    /// `GenericParam` table (0x2A) - Generic parameters of type builders.
    GenericParam = 0x2A,

    /// User-string tag (0x70) - Content-interned string constants.
    ///
    /// Not a metadata table: this is the token tag the `ldstr` instruction uses
    /// to index the `#US` heap. It participates in token formation exactly like
    /// a table tag.
    UserString = 0x70,
}

impl TableId {
    /// Maps a raw token table tag back to its identifier.
    #[must_use]
    pub fn from_tag(tag: u8) -> Option<TableId> {
        TableId::iter().find(|id| *id as u8 == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_tags_match_standard() {
        let expected: &[(TableId, u8)] = &[
            (TableId::TypeRef, 0x01),
            (TableId::TypeDef, 0x02),
            (TableId::Field, 0x04),
            (TableId::MethodDef, 0x06),
            (TableId::MemberRef, 0x0A),
            (TableId::StandAloneSig, 0x11),
            (TableId::GenericParam, 0x2A),
            (TableId::UserString, 0x70),
        ];

        assert_eq!(TableId::COUNT, expected.len());
        for (id, tag) in expected {
            assert_eq!(*id as u8, *tag);
        }
    }

    #[test]
    fn test_tags_unique() {
        let mut seen = std::collections::HashSet::new();
        for id in TableId::iter() {
            assert!(seen.insert(id as u8), "duplicate tag 0x{:02x}", id as u8);
        }
    }

    #[test]
    fn test_from_tag_round_trip() {
        for id in TableId::iter() {
            assert_eq!(TableId::from_tag(id as u8), Some(id));
        }
        assert_eq!(TableId::from_tag(0x03), None);
        assert_eq!(TableId::from_tag(0xFF), None);
    }
}
