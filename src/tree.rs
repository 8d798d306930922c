//! Generic walk over layout trees.
//!
//! Skeletons, mockup structures, and assembled pages all share one node
//! shape: a JSON object with an optional `id`, nested nodes under
//! `children` and `sections`, and an arbitrary typed payload in the
//! remaining keys. Every component that needs lookup-by-id or a whole-tree
//! visit goes through this module instead of hand-rolling its own
//! recursion.

use serde_json::{Map, Value};

/// Keys under which a node nests further nodes.
const CHILD_KEYS: [&str; 2] = ["children", "sections"];

/// Depth-first search for the node carrying `id`.
pub fn find_by_id<'a>(root: &'a Value, id: &str) -> Option<&'a Value> {
    let obj = root.as_object()?;
    if obj.get("id").and_then(Value::as_str) == Some(id) {
        return Some(root);
    }
    for key in CHILD_KEYS {
        if let Some(children) = obj.get(key).and_then(Value::as_array) {
            for child in children {
                if let Some(found) = find_by_id(child, id) {
                    return Some(found);
                }
            }
        }
    }
    None
}

/// Visit every object node in the tree, parents before children.
///
/// The visitor may mutate the node's map; the `children`/`sections` arrays
/// themselves are traversed from their post-visit state.
pub fn visit_nodes_mut(root: &mut Value, visit: &mut impl FnMut(&mut Map<String, Value>)) {
    let Some(obj) = root.as_object_mut() else {
        return;
    };
    visit(obj);
    for key in CHILD_KEYS {
        if let Some(children) = obj.get_mut(key).and_then(Value::as_array_mut) {
            for child in children {
                visit_nodes_mut(child, visit);
            }
        }
    }
}
