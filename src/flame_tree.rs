use serde::Serialize;

pub const ROOT_NAME: &str = "root";

/// A node of a merged call-stack tree.
///
/// `value` counts the stacks that pass through this node. Children keep the
/// order in which they were first seen.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FlameNode {
    pub name: String,
    pub value: u64,
    pub children: Vec<FlameNode>,
}

impl FlameNode {
    pub fn new(name: impl Into<String>) -> FlameNode {
        FlameNode {
            name: name.into(),
            value: 0,
            children: Vec::new(),
        }
    }

    pub fn root() -> FlameNode {
        FlameNode::new(ROOT_NAME)
    }

    /// Adds one stack, outermost frame first, below this node.
    pub fn merge<S: AsRef<str>>(&mut self, frames: &[S]) {
        self.value += 1;
        let mut cursor = self;
        for name in frames {
            let name = name.as_ref();
            // linear scan, fan-out is small in practice
            let pos = match cursor.children.iter().position(|c| c.name == name) {
                Some(pos) => pos,
                None => {
                    cursor.children.push(FlameNode::new(name));
                    cursor.children.len() - 1
                }
            };
            cursor = &mut cursor.children[pos];
            cursor.value += 1;
        }
    }

    #[cfg(test)]
    pub fn child(&self, name: &str) -> Option<&FlameNode> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consistent(node: &FlameNode) {
        let below: u64 = node.children.iter().map(|c| c.value).sum();
        assert!(node.value >= below, "{} has {} < {}", node.name, node.value, below);
        node.children.iter().for_each(assert_consistent);
    }

    #[test]
    fn shared_prefixes_are_merged() {
        let mut root = FlameNode::root();
        root.merge(&["app", "libc", "main"]);
        root.merge(&["app", "libc", "work"]);

        assert_eq!(root.name, "root");
        assert_eq!(root.value, 2);
        let app = root.child("app").unwrap();
        assert_eq!(app.value, 2);
        let libc = app.child("libc").unwrap();
        assert_eq!(libc.value, 2);
        let names: Vec<_> = libc.children.iter().map(|c| (c.name.as_str(), c.value)).collect();
        assert_eq!(names, [("main", 1), ("work", 1)]);
    }

    #[test]
    fn children_keep_first_seen_order() {
        let mut root = FlameNode::root();
        root.merge(&["b"]);
        root.merge(&["a"]);
        root.merge(&["b"]);
        let names: Vec<_> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert_eq!(root.child("b").unwrap().value, 2);
    }

    #[test]
    fn root_counts_every_stack() {
        let stacks: &[&[&str]] = &[
            &["a", "b", "c"],
            &["a", "b"],
            &["a"],
            &[],
            &["x", "b", "c"],
            &["a", "b", "c"],
        ];
        let mut root = FlameNode::root();
        for stack in stacks {
            root.merge(stack);
        }
        assert_eq!(root.value, stacks.len() as u64);
        assert_consistent(&root);
        let c = root.child("a").and_then(|a| a.child("b")).and_then(|b| b.child("c"));
        assert_eq!(c.map(|c| c.value), Some(2));
    }

    #[test]
    fn repeated_names_on_one_path_are_separate_nodes() {
        let mut root = FlameNode::root();
        root.merge(&["f", "f", "f"]);
        let depth2 = root.child("f").and_then(|f| f.child("f")).unwrap();
        assert_eq!(depth2.value, 1);
        assert_eq!(depth2.children.len(), 1);
    }

    #[test]
    fn serializes_as_nested_objects() {
        let mut root = FlameNode::root();
        root.merge(&["app"]);
        let json = serde_json::to_value(&root).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "root",
                "value": 1,
                "children": [{ "name": "app", "value": 1, "children": [] }],
            })
        );
    }
}
