//! In-memory category tree.
//!
//! Categories are stored flat with a nullable `parent_id`. The tree is
//! rebuilt from one full-table scan into an id-indexed arena; all
//! traversals are iterative and track visited ids, so a corrupted parent
//! chain (a cycle) cannot recurse forever.

use crate::models::Category;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// A category together with its ordered children
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

/// Arena of categories keyed by id, with parent -> children adjacency
#[derive(Debug, Default)]
pub struct CategoryTree {
    nodes: HashMap<i64, Category>,
    children: HashMap<i64, Vec<i64>>,
    roots: Vec<i64>,
}

impl CategoryTree {
    /// Build the arena from a flat list of categories
    ///
    /// Nodes without a parent, or whose parent does not exist, are roots.
    /// Sibling lists are ordered by (sort_order, name, id).
    pub fn build(categories: Vec<Category>) -> Self {
        let nodes: HashMap<i64, Category> =
            categories.into_iter().map(|c| (c.id, c)).collect();

        let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut roots = Vec::new();

        for node in nodes.values() {
            match node.parent_id {
                Some(parent) if nodes.contains_key(&parent) => {
                    children.entry(parent).or_default().push(node.id)
                }
                // Orphans still get indexed under their missing parent so that
                // deleting that id would sweep them up.
                Some(parent) => {
                    children.entry(parent).or_default().push(node.id);
                    roots.push(node.id);
                }
                None => roots.push(node.id),
            }
        }

        let mut tree = Self {
            nodes,
            children,
            roots,
        };
        tree.sort_siblings();
        tree
    }

    fn sort_siblings(&mut self) {
        let nodes = &self.nodes;
        let key = |id: &i64| {
            let c = &nodes[id];
            (c.sort_order, c.name.clone(), c.id)
        };

        self.roots.sort_by_key(key);
        for siblings in self.children.values_mut() {
            siblings.sort_by_key(key);
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: i64) -> Option<&Category> {
        self.nodes.get(&id)
    }

    /// Direct children of `id`, in display order
    pub fn children_of(&self, id: i64) -> Vec<&Category> {
        self.child_ids(id)
            .iter()
            .filter_map(|child| self.nodes.get(child))
            .collect()
    }

    fn child_ids(&self, id: i64) -> &[i64] {
        self.children.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `id` followed by every category below it, parents before children
    ///
    /// `id` itself is always the first element, even when no such row
    /// exists, so rows that still point at a missing parent are included.
    pub fn subtree_ids(&self, id: i64) -> Vec<i64> {
        let mut order = Vec::new();
        let mut visited = HashSet::new();
        let mut stack = vec![id];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            order.push(current);
            // Reverse so the first child is visited first
            for child in self.child_ids(current).iter().rev() {
                if !visited.contains(child) {
                    stack.push(*child);
                }
            }
        }

        order
    }

    /// Whether `candidate` is `root` or lies somewhere below it
    pub fn contains_in_subtree(&self, root: i64, candidate: i64) -> bool {
        self.subtree_ids(root).contains(&candidate)
    }

    /// The whole catalog as a nested forest
    ///
    /// Nodes caught in a parent cycle are unreachable from any root; each
    /// such cycle is broken at its lowest-ordered node, which becomes an
    /// extra root after the regular ones.
    pub fn nested(&self) -> Vec<CategoryNode> {
        let mut walk = Walk::default();

        for root in &self.roots {
            self.walk_from(*root, &mut walk);
        }

        // Whatever is left sits on a parent cycle
        let mut stranded: Vec<&Category> = self
            .nodes
            .values()
            .filter(|c| !walk.tree_parent.contains_key(&c.id))
            .collect();
        stranded.sort_by_key(|c| (c.sort_order, c.name.clone(), c.id));
        for category in stranded {
            self.walk_from(category.id, &mut walk);
        }

        // Children appear after their parent in `order`; build bottom-up.
        let mut built: HashMap<i64, CategoryNode> = HashMap::new();
        for id in walk.order.iter().rev() {
            let children = self
                .child_ids(*id)
                .iter()
                .filter(|child| walk.tree_parent.get(child) == Some(&Some(*id)))
                .filter_map(|child| built.remove(child))
                .collect();
            built.insert(
                *id,
                CategoryNode {
                    category: self.nodes[id].clone(),
                    children,
                },
            );
        }

        walk.top_level
            .iter()
            .filter_map(|id| built.remove(id))
            .collect()
    }

    fn walk_from(&self, start: i64, walk: &mut Walk) {
        if walk.tree_parent.contains_key(&start) {
            return;
        }
        walk.top_level.push(start);
        walk.tree_parent.insert(start, None);

        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            walk.order.push(current);
            for child in self.child_ids(current).iter().rev() {
                if self.nodes.contains_key(child) && !walk.tree_parent.contains_key(child) {
                    walk.tree_parent.insert(*child, Some(current));
                    stack.push(*child);
                }
            }
        }
    }
}

/// Pre-order walk state for `CategoryTree::nested`
#[derive(Default)]
struct Walk {
    order: Vec<i64>,
    tree_parent: HashMap<i64, Option<i64>>,
    top_level: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CategoryKind;
    use chrono::Utc;

    fn category(id: i64, parent_id: Option<i64>, name: &str, sort_order: i64) -> Category {
        Category {
            id,
            parent_id,
            name: name.to_string(),
            kind: CategoryKind::Folder,
            customer_price: None,
            wholesale_price: None,
            sort_order,
            updated_at: Utc::now(),
        }
    }

    fn names(nodes: &[CategoryNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.category.name.as_str()).collect()
    }

    #[test]
    fn test_subtree_ids() {
        let tree = CategoryTree::build(vec![
            category(1, None, "Single Vision", 0),
            category(2, Some(1), "Minus", 0),
            category(3, Some(2), "HC", 0),
            category(4, Some(3), "-6.00 to -2.00", 0),
            category(5, Some(1), "Plus", 1),
            category(6, None, "Bifocal", 1),
        ]);

        assert_eq!(tree.subtree_ids(1), vec![1, 2, 3, 4, 5]);
        assert_eq!(tree.subtree_ids(3), vec![3, 4]);
        assert_eq!(tree.subtree_ids(6), vec![6]);
        assert!(tree.contains_in_subtree(1, 4));
        assert!(!tree.contains_in_subtree(5, 4));
    }

    #[test]
    fn test_subtree_of_missing_id_collects_orphans() {
        let tree = CategoryTree::build(vec![
            category(2, Some(99), "Orphan", 0),
            category(3, Some(2), "Orphan child", 0),
        ]);

        assert_eq!(tree.subtree_ids(99), vec![99, 2, 3]);
    }

    #[test]
    fn test_cycle_terminates() {
        let tree = CategoryTree::build(vec![
            category(1, Some(2), "A", 0),
            category(2, Some(1), "B", 0),
            category(3, Some(3), "Self", 0),
        ]);

        assert_eq!(tree.subtree_ids(1), vec![1, 2]);
        assert_eq!(tree.subtree_ids(3), vec![3]);

        let nested = tree.nested();
        let total: usize = nested.iter().map(|n| 1 + n.children.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_nested_sibling_order() {
        let tree = CategoryTree::build(vec![
            category(1, None, "Root", 0),
            category(2, Some(1), "Zeta", 0),
            category(3, Some(1), "Alpha", 0),
            category(4, Some(1), "First", -1),
            category(5, None, "Another root", 0),
        ]);

        let nested = tree.nested();
        assert_eq!(names(&nested), vec!["Another root", "Root"]);
        assert_eq!(names(&nested[1].children), vec!["First", "Alpha", "Zeta"]);
    }

    #[test]
    fn test_nested_serializes_children() {
        let tree = CategoryTree::build(vec![
            category(1, None, "Root", 0),
            category(2, Some(1), "Child", 0),
        ]);

        let value = serde_json::to_value(tree.nested()).unwrap();
        assert_eq!(value[0]["name"], "Root");
        assert_eq!(value[0]["children"][0]["name"], "Child");
        assert_eq!(value[0]["children"][0]["parentId"], 1);
    }

    #[test]
    fn test_children_of() {
        let tree = CategoryTree::build(vec![
            category(1, None, "Root", 0),
            category(2, Some(1), "B", 0),
            category(3, Some(1), "A", 0),
        ]);

        let children: Vec<i64> = tree.children_of(1).iter().map(|c| c.id).collect();
        assert_eq!(children, vec![3, 2]);
        assert!(tree.children_of(2).is_empty());
        assert_eq!(tree.len(), 3);
    }
}
