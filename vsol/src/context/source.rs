//! Write-once source attribution for AST nodes

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::ast::NodeId;
use crate::error::Defect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub path: PathBuf,
    pub line: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.path.display(), self.line)
    }
}

#[derive(Debug, Default)]
pub(crate) struct SourceMap {
    locations: BTreeMap<NodeId, SourceLocation>,
}

impl SourceMap {
    pub(crate) fn attribute(&mut self, node: NodeId, path: &Path, line: usize) -> Result<(), Defect> {
        if self.locations.contains_key(&node) {
            return Err(Defect::SourceReattributed(node));
        }
        self.locations.insert(
            node,
            SourceLocation {
                path: path.to_path_buf(),
                line,
            },
        );
        Ok(())
    }

    pub(crate) fn get(&self, node: NodeId) -> Result<&SourceLocation, Defect> {
        self.locations.get(&node).ok_or(Defect::MissingSource(node))
    }

    pub(crate) fn len(&self) -> usize {
        self.locations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_once() {
        let mut map = SourceMap::default();
        map.attribute(NodeId(1), Path::new("/a.sol"), 4).unwrap();

        let err = map.attribute(NodeId(1), Path::new("/b.sol"), 9).unwrap_err();
        assert_eq!(err, Defect::SourceReattributed(NodeId(1)));

        // First attribution survives the rejected one
        let loc = map.get(NodeId(1)).unwrap();
        assert_eq!(loc.path, PathBuf::from("/a.sol"));
        assert_eq!(loc.line, 4);
        assert_eq!(loc.to_string(), "/a.sol:4");
    }

    #[test]
    fn test_missing_source() {
        let map = SourceMap::default();
        assert_eq!(map.get(NodeId(7)).unwrap_err(), Defect::MissingSource(NodeId(7)));
    }
}
