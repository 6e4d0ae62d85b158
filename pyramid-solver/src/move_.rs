use pyramid_common::action::Action;

/// Index of a node in a [`MoveTree`].
pub type MoveRef = u32;

/// The root node, holding no action.
pub const ROOT: MoveRef = 0;

#[derive(Debug, Copy, Clone, Default)]
pub struct MoveNode {
    pub parent: MoveRef,
    pub action: Option<Action>,
}

/// Append-only store of the moves made along the search. Every state points
/// at the node of the move that produced it, so sibling states share the
/// history of their common parent and never see each other's moves.
#[derive(Debug, Clone)]
pub struct MoveTree {
    nodes: Vec<MoveNode>,
}

impl Default for MoveTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MoveTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![MoveNode::default()],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn push(&mut self, parent: MoveRef, action: Action) -> MoveRef {
        self.nodes.push(MoveNode {
            parent,
            action: Some(action),
        });
        (self.nodes.len() - 1) as MoveRef
    }

    /// Drops every node pushed after the tree had `len` nodes. The root is
    /// always kept.
    #[inline]
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len.max(1));
    }

    pub fn clear(&mut self) {
        self.truncate(1);
    }

    /// Collects the actions leading to `index`, oldest first.
    pub fn copy(&self, index: MoveRef) -> Vec<Action> {
        let mut actions = vec![];
        let mut current = index;
        loop {
            let node = self.nodes[current as usize];
            let Some(action) = node.action else {
                break;
            };
            actions.push(action);
            current = node.parent;
        }
        actions.reverse();
        actions
    }
}
