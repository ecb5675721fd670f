//! Two-level addresses of elements.

use std::fmt;

/// The address of one element: a section and an item inside it.
///
/// Paths order by section first, then item, which is the order in which an
/// observer walks a flattened collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct IndexPath {
    /// The section component. Rewritten as the path crosses containers.
    pub section: usize,
    /// The item component. Never rewritten.
    pub item: usize,
}

impl IndexPath {
    /// Creates a path.
    pub const fn new(section: usize, item: usize) -> Self {
        Self { section, item }
    }

    /// Returns the same item in another section.
    pub const fn with_section(self, section: usize) -> Self {
        Self {
            section,
            item: self.item,
        }
    }

    /// Returns the path with its section shifted by `offset`.
    pub const fn offset_by(self, offset: usize) -> Self {
        self.with_section(self.section + offset)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.section, self.item)
    }
}
