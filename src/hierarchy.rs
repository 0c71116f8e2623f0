//! Containment relationships between tracking volumes.
//!
//! Volumes nest: a barrel volume sits inside the world volume, a layer gap
//! sits inside the barrel. The hierarchy records, for each volume, its
//! containing parent and its children in declaration order. Position lookups
//! walk it from the root downwards, testing a parent before its children.


/// Hierarchical containment relationships between volumes.
///
/// **Context**: Navigation needs to know the innermost volume holding a
/// position when a track is seeded or re-seeded.
///
/// **How it Works**: Each volume has at most one parent. Children are kept in
/// the order they were attached, which makes the descent deterministic when
/// touching volumes both claim a position on their shared boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VolumeHierarchy {
    parent: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
}

impl VolumeHierarchy {
    /// Registers one more volume without parent, returning its index.
    pub fn push(&mut self) -> usize {
        self.parent.push(None);
        self.children.push(Vec::new());
        self.parent.len() - 1
    }

    pub fn set_parent(&mut self, child: usize, parent: usize) {
        assert!(
            child < self.parent.len(),
            "child id is {}, but the hierarchy only has space for {} volumes",
            child,
            self.parent.len()
        );
        assert!(
            parent < self.parent.len(),
            "parent id is {}, but the hierarchy only has space for {} volumes",
            parent,
            self.parent.len()
        );
        assert!(child != parent, "volume {} cannot contain itself", child);
        if let Some(old) = self.parent[child] {
            self.children[old].retain(|&c| c != child);
        }
        self.parent[child] = Some(parent);
        self.children[parent].push(child);
    }

    pub fn get_parent(&self, volume: usize) -> Option<usize> {
        self.parent[volume]
    }

    pub fn children(&self, volume: usize) -> &[usize] {
        &self.children[volume]
    }

    /// Walks down from `start` into the first child accepted by `contains`,
    /// as long as there is one. Returns the deepest volume reached.
    pub fn descend(&self, start: usize, contains: impl Fn(usize) -> bool) -> usize {
        let mut current = start;
        while let Some(&child) = self.children[current].iter().find(|&&c| contains(c)) {
            current = child;
        }
        current
    }
}
