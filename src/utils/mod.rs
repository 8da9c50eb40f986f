//! Looking nodes up in an in-memory tree.

pub mod chosen;

use crate::tree::Node;
use alloc::vec::Vec;

/// First string of a string property value.
pub(crate) fn first_str(value: &[u8]) -> Option<&str> {
    let end = value.iter().position(|&b| b == 0).unwrap_or(value.len());
    core::str::from_utf8(&value[..end]).ok()
}

impl Node {
    /// Try to get a node by a full path.
    fn raw_find(&self, path: &str) -> Option<&Node> {
        let path = path.strip_prefix('/')?;
        let mut current = self;
        // Split path with / and find each level
        for name in path.split('/').filter(|name| !name.is_empty()) {
            current = current.get_child(name)?;
        }
        Some(current)
    }

    /// Try to get a node by path.
    ///
    /// Absolute paths are resolved one full node name at a time. Anything
    /// else is looked up as a property of `/aliases`, whose value is the
    /// full path of the node.
    pub fn find(&self, path: &str) -> Option<&Node> {
        if path.starts_with('/') {
            return self.raw_find(path);
        }
        let aliases = self.raw_find("/aliases")?;
        let full_path = first_str(aliases.get_prop(path)?.value())?;
        if !full_path.starts_with('/') {
            return None;
        }
        self.raw_find(full_path)
    }

    /// Depth-first traversal of the tree, calling `func` on each node
    /// before its children.
    pub fn search<F>(&self, func: &mut F)
    where
        F: FnMut(&Node),
    {
        let mut stack: Vec<&Node> = Vec::from([self]);
        while let Some(node) = stack.pop() {
            func(node);
            stack.extend(node.children().iter().rev());
        }
    }
}
