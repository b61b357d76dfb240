//! The link table a presentation layer paints hyperlinks from.

/// Where activating a link should land inside the target class's own view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAnchor {
    /// Scroll to the declaration of this simple type name.
    Type(String),
    /// Scroll to the first method with this name.
    Method(String),
}

/// One clickable region over reconstructed source.
///
/// `start_offset` and `end_offset` are 0-based character offsets into the
/// document text, end exclusive; `line` and `column` repeat the 1-based
/// position of the link start for layers that address by position. The span
/// covers the written name and nothing else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolLink {
    pub start_offset: usize,
    pub end_offset: usize,
    pub line: u32,
    pub column: u32,
    /// Display name of the archive that owns the target class.
    pub archive: String,
    /// Internal name of the target class.
    pub class_name: String,
    pub anchor: Option<LinkAnchor>,
}

/// Append-only collection of links: import links first, then links in the
/// order the resolver walked the tree.
#[derive(Debug, Default)]
pub struct LinkTable {
    links: Vec<SymbolLink>,
}

impl LinkTable {
    pub fn push(&mut self, link: SymbolLink) {
        self.links.push(link);
    }

    pub fn links(&self) -> &[SymbolLink] {
        &self.links
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// The link covering a character offset, if any. Link spans never
    /// overlap; a nested generic argument links on its own name, outside
    /// the base type's span.
    pub fn link_at(&self, offset: usize) -> Option<&SymbolLink> {
        self.links
            .iter()
            .find(|link| link.start_offset <= offset && offset < link.end_offset)
    }
}

impl IntoIterator for LinkTable {
    type Item = SymbolLink;
    type IntoIter = std::vec::IntoIter<SymbolLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.into_iter()
    }
}

impl<'a> IntoIterator for &'a LinkTable {
    type Item = &'a SymbolLink;
    type IntoIter = std::slice::Iter<'a, SymbolLink>;

    fn into_iter(self) -> Self::IntoIter {
        self.links.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(start: usize, end: usize, class: &str) -> SymbolLink {
        SymbolLink {
            start_offset: start,
            end_offset: end,
            line: 1,
            column: start as u32 + 1,
            archive: "app.jar".to_string(),
            class_name: class.to_string(),
            anchor: None,
        }
    }

    #[test]
    fn link_at_respects_half_open_spans() {
        let mut table = LinkTable::default();
        table.push(link(4, 10, "demo/First"));
        table.push(link(12, 15, "demo/Second"));

        assert!(table.link_at(3).is_none());
        assert_eq!(table.link_at(4).map(|l| l.class_name.as_str()), Some("demo/First"));
        assert_eq!(table.link_at(9).map(|l| l.class_name.as_str()), Some("demo/First"));
        assert!(table.link_at(10).is_none());
        assert_eq!(table.link_at(12).map(|l| l.class_name.as_str()), Some("demo/Second"));
    }
}
