use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::AuthorSummary;

/// A comment with its replies nested under it, ready for serialization.
/// Flat rows come out of the query newest-first; the builder keeps that
/// order within every sibling group.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentNode {
    pub id: i64,
    pub content: String,
    pub parent_id: Option<i64>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub created_at: String,
    pub updated_at: String,
    pub author: Option<AuthorSummary>,
    pub replies: Vec<CommentNode>,
}

/// Organize a flat, parent-referencing comment list into a forest of root
/// comments. Two passes: index every node by id, then attach each node to
/// its parent's replies (or the root list). A comment whose parent is not in
/// the fetched set is dropped, not promoted to root.
pub fn build(flat: Vec<CommentNode>) -> Vec<CommentNode> {
    let mut arena: HashMap<i64, CommentNode> = HashMap::with_capacity(flat.len());
    let mut order: Vec<(i64, Option<i64>)> = Vec::with_capacity(flat.len());
    for node in flat {
        order.push((node.id, node.parent_id));
        arena.insert(node.id, node);
    }

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut roots: Vec<i64> = Vec::new();
    for &(id, parent_id) in &order {
        match parent_id {
            None => roots.push(id),
            Some(pid) if arena.contains_key(&pid) => {
                children.entry(pid).or_default().push(id);
            }
            // Orphaned: parent soft-deleted or outside the fetched set.
            Some(_) => {}
        }
    }

    // Reverse pre-order visits a node only after all of its descendants, so
    // each parent picks up fully assembled subtrees. Iterative: reply depth
    // is unbounded.
    let mut visit: Vec<i64> = Vec::with_capacity(order.len());
    let mut stack: Vec<i64> = roots.clone();
    while let Some(id) = stack.pop() {
        visit.push(id);
        if let Some(child_ids) = children.get(&id) {
            stack.extend(child_ids.iter().copied());
        }
    }
    for id in visit.into_iter().rev() {
        if let Some(child_ids) = children.get(&id) {
            let replies: Vec<CommentNode> = child_ids
                .iter()
                .filter_map(|child| arena.remove(child))
                .collect();
            if let Some(node) = arena.get_mut(&id) {
                node.replies = replies;
            }
        }
    }

    // Whatever is still in the arena at this point is an orphan subtree.
    roots
        .into_iter()
        .filter_map(|id| arena.remove(&id))
        .collect()
}
