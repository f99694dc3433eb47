//! Library name to numeric id registry
//!
//! Duplicates are only ever called within a library, so the library id is
//! the major key of every duplicate ordering. Ids are small positive
//! integers handed out in order of first sight, starting at 1.

use bstr::{BStr, BString};
use noodles::sam::Header as SamHeader;
use std::collections::HashMap;

use crate::record::AlignmentRecord;

/// Library name used for records without a read group, or whose read group has no library
pub const UNKNOWN_LIBRARY: &str = "Unknown Library";

/// Assigns stable ids to library names and resolves records to their library
///
/// Mutated on every newly seen library; one registry belongs to exactly one
/// [`crate::OrderingPolicy`].
#[derive(Debug, Clone)]
pub struct LibraryRegistry {
    ids: HashMap<String, u32>,
    next_id: u32,
    read_group_libraries: HashMap<BString, String>,
}

impl LibraryRegistry {
    /// Empty registry; every record resolves to [`UNKNOWN_LIBRARY`] until read groups are known.
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            next_id: 1,
            read_group_libraries: HashMap::new(),
        }
    }

    /// Registry knowing the given `(read group id, library name)` pairs.
    ///
    /// Library names are registered in iteration order before any comparison
    /// happens; a name repeated across read groups keeps its first id.
    pub fn with_read_groups<I, K, V>(read_groups: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<BString>,
        V: Into<String>,
    {
        let mut registry = Self::new();
        for (rg, library) in read_groups {
            let library = library.into();
            registry.id_for(&library);
            registry.read_group_libraries.insert(rg.into(), library);
        }
        registry
    }

    /// Registry seeded from the `@RG` lines of a SAM header that carry an `LB` field.
    pub fn from_header(header: &SamHeader) -> Self {
        Self::with_read_groups(crate::io::read_group_libraries(header))
    }

    /// Id for `name`, allocating the next id on first sight.
    pub fn id_for(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Library name of a record, falling back to [`UNKNOWN_LIBRARY`].
    pub fn library_name(&self, record: &AlignmentRecord) -> &str {
        record
            .read_group()
            .and_then(|rg: &BStr| self.read_group_libraries.get(rg))
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LIBRARY)
    }

    /// Library id of a record, registering its library if new.
    pub fn library_id(&mut self, record: &AlignmentRecord) -> u32 {
        if let Some(&id) = self.ids.get(self.library_name(record)) {
            return id;
        }
        let name = self.library_name(record).to_string();
        self.id_for(&name)
    }

    /// Number of registered library names
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl Default for LibraryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordBuilder;

    #[test]
    fn test_ids_in_first_seen_order() {
        let mut registry = LibraryRegistry::new();
        assert_eq!(registry.id_for("A"), 1);
        assert_eq!(registry.id_for("B"), 2);
        assert_eq!(registry.id_for("A"), 1);
        assert_eq!(registry.id_for("B"), 2);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_unknown_library_fallbacks() {
        let mut registry = LibraryRegistry::with_read_groups([("rg1", "libA")]);
        let no_rg = RecordBuilder::new().name("r1").build();
        let unknown_rg = RecordBuilder::new().name("r2").read_group("rg9").build();
        assert_eq!(registry.library_name(&no_rg), UNKNOWN_LIBRARY);
        assert_eq!(registry.library_name(&unknown_rg), UNKNOWN_LIBRARY);
        assert_eq!(registry.library_id(&no_rg), 2);
        assert_eq!(registry.library_id(&unknown_rg), 2);
    }

    #[test]
    fn test_prepopulated_ids_precede_comparisons() {
        let mut registry =
            LibraryRegistry::with_read_groups([("rg1", "libA"), ("rg2", "libB"), ("rg3", "libA")]);
        assert_eq!(registry.len(), 2);

        let rec = RecordBuilder::new().read_group("rg3").build();
        assert_eq!(registry.library_name(&rec), "libA");
        assert_eq!(registry.library_id(&rec), 1);

        let rec = RecordBuilder::new().read_group("rg2").build();
        assert_eq!(registry.library_id(&rec), 2);
        assert_eq!(registry.id_for("libC"), 3);
    }

    #[test]
    fn test_ids_stay_distinct_past_u16_range() {
        let mut registry = LibraryRegistry::new();
        let count = u32::from(u16::MAX) + 10;
        for i in 0..count {
            assert_eq!(registry.id_for(&format!("lib{i}")), i + 1);
        }
        assert_eq!(registry.len(), count as usize);
        assert_eq!(registry.id_for("lib65535"), 65_536);
        assert_eq!(registry.id_for("lib65540"), 65_541);
    }

    #[test]
    fn test_independent_registries() {
        let mut a = LibraryRegistry::new();
        let mut b = LibraryRegistry::new();
        a.id_for("x");
        assert_eq!(a.id_for("y"), 2);
        assert_eq!(b.id_for("y"), 1);
    }
}
