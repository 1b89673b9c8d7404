use crate::importer::{Conversation, Metadata, Role};
use indexmap::IndexMap;

const CODE_FENCE: &str = "```";

/// One chat turn, as stored in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageNode {
    id: String,
    pub role: Role,
    pub text: String,
    pub metadata: Metadata,
}

impl MessageNode {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        text: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            text: text.into(),
            metadata,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Nothing to render: no text and no metadata.
    pub fn is_data_less(&self) -> bool {
        self.text.is_empty() && self.metadata.is_empty()
    }
}

#[derive(Debug, Default)]
struct Vertex {
    /// `None` for ids only ever seen as someone's parent.
    node: Option<MessageNode>,
    /// Edge targets, in the order the edges were added.
    children: Vec<usize>,
    in_degree: usize,
}

/// Directed "is-reply-to" graph of one conversation.
///
/// Vertices are keyed by message id and kept in first-mention order, which is
/// what makes root selection and traversal reproducible for identical input.
/// Adjacency is index based; nothing holds a reference back to its parent.
#[derive(Debug, Default)]
pub struct ConversationGraph {
    vertices: IndexMap<String, Vertex>,
}

impl ConversationGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn vertex_index(&mut self, id: &str) -> usize {
        match self.vertices.get_index_of(id) {
            Some(index) => index,
            None => self.vertices.insert_full(id.to_string(), Vertex::default()).0,
        }
    }

    /// Attach a message to its vertex. A vertex that already exists (because
    /// a child named it as parent) keeps its position.
    pub fn add_node(&mut self, node: MessageNode) {
        let index = self.vertex_index(node.id());
        self.vertices[index].node = Some(node);
    }

    /// Add `parent -> child`, creating either end as a bare vertex if needed.
    /// Adding the same edge twice has no effect.
    pub fn add_edge(&mut self, parent: &str, child: &str) {
        let from = self.vertex_index(parent);
        let to = self.vertex_index(child);
        if self.vertices[from].children.contains(&to) {
            return;
        }
        self.vertices[from].children.push(to);
        self.vertices[to].in_degree += 1;
    }

    /// The message stored under `id`, if any.
    pub fn node(&self, id: &str) -> Option<&MessageNode> {
        self.vertices.get(id).and_then(|v| v.node.as_ref())
    }

    /// Vertices with no incoming edge, in first-mention order.
    pub fn roots(&self) -> impl Iterator<Item = &str> + '_ {
        self.vertices
            .iter()
            .filter(|(_, v)| v.in_degree == 0)
            .map(|(id, _)| id.as_str())
    }

    pub fn first_root(&self) -> Option<&str> {
        self.roots().next()
    }

    /// Depth-first pre-order walk starting at `root`. Children are visited in
    /// edge-insertion order and every vertex at most once, so cycles reachable
    /// from `root` terminate. Unknown `root` yields nothing.
    pub fn preorder(&self, root: &str) -> Preorder<'_> {
        let mut visited = vec![false; self.vertices.len()];
        let pending = self.vertices.get_index_of(root);
        if let Some(start) = pending {
            visited[start] = true;
        }
        Preorder {
            graph: self,
            stack: Vec::new(),
            visited,
            pending,
        }
    }

    fn entry_at(&self, index: usize) -> (&str, Option<&MessageNode>) {
        self.vertices
            .get_index(index)
            .map(|(id, v)| (id.as_str(), v.node.as_ref()))
            .unwrap_or(("", None))
    }

    fn children_of(&self, index: usize) -> &[usize] {
        self.vertices
            .get_index(index)
            .map(|(_, v)| v.children.as_slice())
            .unwrap_or(&[])
    }
}

/// Iterator returned by [`ConversationGraph::preorder`]. Yields each vertex id
/// with its message, or `None` for bare parent vertices.
pub struct Preorder<'a> {
    graph: &'a ConversationGraph,
    /// (vertex, next child position)
    stack: Vec<(usize, usize)>,
    visited: Vec<bool>,
    pending: Option<usize>,
}

impl<'a> Iterator for Preorder<'a> {
    type Item = (&'a str, Option<&'a MessageNode>);

    fn next(&mut self) -> Option<Self::Item> {
        let graph = self.graph;
        if let Some(start) = self.pending.take() {
            self.stack.push((start, 0));
            return Some(graph.entry_at(start));
        }

        loop {
            let top = self.stack.len().checked_sub(1)?;
            let (vertex, cursor) = self.stack[top];
            match graph.children_of(vertex).get(cursor) {
                Some(&child) => {
                    self.stack[top].1 += 1;
                    if !self.visited[child] {
                        self.visited[child] = true;
                        self.stack.push((child, 0));
                        return Some(graph.entry_at(child));
                    }
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Close a trailing unterminated code fence. Only the last fence is fixed;
/// an imbalance earlier in the text is left alone.
pub fn close_code_fence(mut text: String) -> String {
    if text.matches(CODE_FENCE).count() % 2 != 0 {
        text.push('\n');
        text.push_str(CODE_FENCE);
    }
    text
}

/// Rebuild the message tree of one conversation from its parent pointers.
///
/// Returns `None` when the record has no `mapping`. Null entries and entries
/// with a null `message` produce neither a node nor an edge, but an id named
/// as `parent` always becomes a vertex.
pub fn build_graph(conversation: &Conversation) -> Option<ConversationGraph> {
    let mapping = conversation.mapping.as_ref()?;
    let mut graph = ConversationGraph::new();

    for (id, entry) in mapping {
        let Some(entry) = entry else { continue };
        let Some(message) = entry.message.as_ref() else {
            continue;
        };

        let text = close_code_fence(message.text().to_string());
        graph.add_node(MessageNode::new(
            id.as_str(),
            message.role(),
            text,
            message.metadata(),
        ));

        if let Some(parent) = entry.parent.as_deref().filter(|p| !p.is_empty()) {
            graph.add_edge(parent, id);
        }
    }

    Some(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn conversation(value: serde_json::Value) -> Conversation {
        serde_json::from_value(value).unwrap()
    }

    fn user(text: &str) -> serde_json::Value {
        json!({ "author": { "role": "user" }, "content": { "parts": [text] } })
    }

    fn vertex_ids(graph: &ConversationGraph) -> Vec<&str> {
        graph.vertices.keys().map(String::as_str).collect()
    }

    fn order(graph: &ConversationGraph) -> Vec<&str> {
        graph
            .preorder(graph.first_root().unwrap())
            .map(|(id, _)| id)
            .collect()
    }

    #[test]
    fn missing_mapping_yields_no_graph() {
        assert!(build_graph(&conversation(json!({ "title": "x" }))).is_none());
        assert!(build_graph(&conversation(json!({ "mapping": null }))).is_none());
    }

    #[test]
    fn empty_mapping_yields_empty_graph() {
        let graph = build_graph(&conversation(json!({ "mapping": {} }))).unwrap();
        assert!(vertex_ids(&graph).is_empty());
        assert!(graph.first_root().is_none());
    }

    #[test]
    fn null_entries_are_skipped_but_parent_ids_become_vertices() {
        let graph = build_graph(&conversation(json!({
            "mapping": {
                "root": { "message": null, "parent": null },
                "gone": null,
                "a": { "message": user("hi"), "parent": "root" }
            }
        })))
        .unwrap();

        assert_eq!(vertex_ids(&graph), ["a", "root"]);
        assert!(graph.node("root").is_none());
        assert_eq!(graph.first_root(), Some("root"));
        assert_eq!(graph.node("a").unwrap().text, "hi");
    }

    #[test]
    fn empty_parent_is_a_root() {
        let graph = build_graph(&conversation(json!({
            "mapping": { "a": { "message": user("hi"), "parent": "" } }
        })))
        .unwrap();
        assert_eq!(graph.first_root(), Some("a"));
        assert_eq!(vertex_ids(&graph), ["a"]);
    }

    #[test]
    fn preorder_follows_insertion_order() {
        let graph = build_graph(&conversation(json!({
            "mapping": {
                "A": { "message": user("a"), "parent": null },
                "B": { "message": user("b"), "parent": "A" },
                "D": { "message": user("d"), "parent": "B" },
                "C": { "message": user("c"), "parent": "A" }
            }
        })))
        .unwrap();
        assert_eq!(order(&graph), ["A", "B", "D", "C"]);
    }

    #[test]
    fn child_listed_before_parent_keeps_first_mention_position() {
        let graph = build_graph(&conversation(json!({
            "mapping": {
                "child": { "message": user("c"), "parent": "root" },
                "root": { "message": user("r") }
            }
        })))
        .unwrap();
        let roots: Vec<_> = graph.roots().collect();
        assert_eq!(roots, ["root"]);
        assert_eq!(order(&graph), ["root", "child"]);
        assert_eq!(graph.node("root").unwrap().text, "r");
    }

    #[test]
    fn cycle_has_no_root_and_traversal_terminates() {
        let mut graph = ConversationGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("b", "a");
        assert!(graph.first_root().is_none());

        let visited: Vec<_> = graph.preorder("a").map(|(id, _)| id).collect();
        assert_eq!(visited, ["a", "b"]);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut graph = ConversationGraph::new();
        graph.add_edge("a", "b");
        graph.add_edge("a", "b");
        let visited: Vec<_> = graph.preorder("a").map(|(id, _)| id).collect();
        assert_eq!(visited, ["a", "b"]);
        assert_eq!(graph.roots().count(), 1);
    }

    #[test]
    fn shared_child_is_visited_once() {
        let mut graph = ConversationGraph::new();
        graph.add_edge("r", "x");
        graph.add_edge("r", "y");
        graph.add_edge("x", "z");
        graph.add_edge("y", "z");
        let visited: Vec<_> = graph.preorder("r").map(|(id, _)| id).collect();
        assert_eq!(visited, ["r", "x", "z", "y"]);
    }

    #[test]
    fn unknown_root_yields_nothing() {
        let graph = ConversationGraph::new();
        assert_eq!(graph.preorder("nope").count(), 0);
    }

    #[test]
    fn odd_fences_get_closed() {
        assert_eq!(
            close_code_fence("```rust\nfn main() {}".into()),
            "```rust\nfn main() {}\n```"
        );
        assert_eq!(
            close_code_fence("a ``` b ``` c ```".into()),
            "a ``` b ``` c ```\n```"
        );
    }

    #[test]
    fn even_fences_are_untouched() {
        assert_eq!(close_code_fence("plain".into()), "plain");
        assert_eq!(close_code_fence(String::new()), "");
        assert_eq!(close_code_fence("```\nx\n```".into()), "```\nx\n```");
    }

    #[test]
    fn builder_applies_fence_fixup() {
        let graph = build_graph(&conversation(json!({
            "mapping": { "a": { "message": user("```py\nprint(1)") } }
        })))
        .unwrap();
        assert!(graph.node("a").unwrap().text.ends_with("\n```"));
    }

    #[test]
    fn data_less_nodes() {
        assert!(MessageNode::new("x", Role::User, "", Metadata::new()).is_data_less());
        assert!(!MessageNode::new("x", Role::User, "t", Metadata::new()).is_data_less());

        let mut meta = Metadata::new();
        meta.insert("k".into(), json!(1));
        assert!(!MessageNode::new("x", Role::System, "", meta).is_data_less());
    }
}
