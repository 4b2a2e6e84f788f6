//! Subject model: a rooted phylogenetic tree with per-node attributes.
//!
//! Codecs (Newick/NEXUS/binary) and distance metrics live outside this
//! crate; the pipeline only needs construction, traversal and attributes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// The subject as loaded: an ordered, non-empty list of trees.
pub type TreeCollection = Vec<Tree>;

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct TreeNode {
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    pub name: Option<String>,
    pub length: Option<f64>,
    #[serde(default)]
    pub attributes: HashMap<String, AttributeValue>,
}

impl TreeNode {
    fn new(parent: Option<usize>, name: Option<String>, length: Option<f64>) -> Self {
        Self {
            parent,
            children: Vec::new(),
            name,
            length,
            attributes: HashMap::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Nodes are addressed by index into `nodes`; node 0 is always the root.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
pub struct Tree {
    nodes: Vec<TreeNode>,
}

impl Tree {
    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::new(None, None, None)],
        }
    }

    pub fn root(&self) -> usize {
        0
    }

    /// Total number of nodes; a tree always has at least its root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: usize) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: usize) -> &mut TreeNode {
        &mut self.nodes[id]
    }

    pub fn add_child(
        &mut self,
        parent: usize,
        name: Option<&str>,
        length: Option<f64>,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes
            .push(TreeNode::new(Some(parent), name.map(str::to_string), length));
        self.nodes[parent].children.push(id);
        id
    }

    /// Node ids in parent-before-children order, children left to right.
    pub fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            order.push(id);
            for child in self.nodes[id].children.iter().rev() {
                stack.push(*child);
            }
        }
        order
    }

    /// Node ids in children-before-parent order.
    pub fn postorder(&self) -> Vec<usize> {
        let mut order = self.preorder();
        order.reverse();
        order
    }

    /// Leaf ids in left-to-right display order.
    pub fn leaves(&self) -> Vec<usize> {
        self.preorder()
            .into_iter()
            .filter(|id| self.nodes[*id].is_leaf())
            .collect()
    }

    pub fn set_attribute(&mut self, id: usize, key: &str, value: AttributeValue) {
        self.nodes[id].attributes.insert(key.to_string(), value);
    }

    /// Sorted union of attribute names over all nodes.
    pub fn attribute_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for node in &self.nodes {
            for key in node.attributes.keys() {
                names.insert(key.clone());
            }
        }
        names.into_iter().collect()
    }

    /// Number of nodes in the subtree rooted at `id`, including `id`.
    pub fn subtree_size(&self, id: usize) -> usize {
        let mut count = 0;
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            count += 1;
            stack.extend(self.nodes[current].children.iter().copied());
        }
        count
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Tree {
        // ((A,B),C)
        let mut tree = Tree::new();
        let inner = tree.add_child(0, None, Some(1.0));
        tree.add_child(inner, Some("A"), Some(2.0));
        tree.add_child(inner, Some("B"), Some(3.0));
        tree.add_child(0, Some("C"), Some(4.0));
        tree
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let tree = sample();
        let order = tree.preorder();
        assert_eq!(order[0], tree.root());
        for id in &order {
            if let Some(parent) = tree.node(*id).parent {
                let parent_pos = order.iter().position(|o| o == &parent).unwrap();
                let own_pos = order.iter().position(|o| o == id).unwrap();
                assert!(parent_pos < own_pos);
            }
        }
    }

    #[test]
    fn leaves_in_display_order() {
        let tree = sample();
        let names: Vec<_> = tree
            .leaves()
            .into_iter()
            .map(|id| tree.node(id).name.clone().unwrap())
            .collect();
        assert_eq!(names, ["A", "B", "C"]);
    }

    #[test]
    fn attribute_names_are_sorted_and_deduplicated() {
        let mut tree = sample();
        tree.set_attribute(1, "support", AttributeValue::Number(0.95));
        tree.set_attribute(2, "support", AttributeValue::Number(1.0));
        tree.set_attribute(2, "habitat", AttributeValue::Text("marine".into()));
        assert_eq!(tree.attribute_names(), ["habitat", "support"]);
    }

    #[test]
    fn subtree_size_counts_self() {
        let tree = sample();
        assert_eq!(tree.subtree_size(tree.root()), 5);
        assert_eq!(tree.subtree_size(1), 3);
        assert_eq!(tree.subtree_size(4), 1);
    }
}
