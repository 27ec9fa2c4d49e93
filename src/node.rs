use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ops::{Index, IndexMut};

/// Stable index into the graph arena. Ids are assigned depth-first,
/// pre-order, starting at zero, and never change for the life of the graph.
pub type NodeId = usize;

/// Syntactic kinds that count as statements for control/data wiring.
pub const STATEMENTS: &[&str] = &[
    "BlockStatement",
    "BreakStatement",
    "ContinueStatement",
    "DoWhileStatement",
    "DebuggerStatement",
    "EmptyStatement",
    "ExpressionStatement",
    "ForStatement",
    "ForOfStatement",
    "ForInStatement",
    "IfStatement",
    "LabeledStatement",
    "ReturnStatement",
    "SwitchStatement",
    "ThrowStatement",
    "TryStatement",
    "WhileStatement",
    "WithStatement",
    "VariableDeclaration",
    "CatchClause",
    "SwitchCase",
    "ConditionalExpression",
    "FunctionDeclaration",
    "ClassDeclaration",
];

pub const COMMENTS: &[&str] = &["Line", "Block"];

/// Edge label. `Epsilon` stands for unconditional sequencing (and is the
/// label of every statement/comment edge); `Cond` carries the branch taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeLabel {
    Epsilon,
    Cond(bool),
    Data,
}

/// One half of a mirrored edge. The kind (control/data/statement/comment) is
/// encoded by the bucket the entry lives in; `begin`/`end` point at the
/// defining and using identifier nodes of data edges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependence {
    pub extremity: NodeId,
    pub label: EdgeLabel,
    pub begin: Option<NodeId>,
    pub end: Option<NodeId>,
}

impl Dependence {
    fn new(extremity: NodeId, label: EdgeLabel) -> Self {
        Self {
            extremity,
            label,
            begin: None,
            end: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Syntactic kind, verbatim from the parser (`Program`, `Identifier`, ...).
    pub name: String,
    /// Literal attributes copied from the source AST (`name`, `value`, `raw`,
    /// `kind`, `operator`, `computed`, `range`, `regex`); unknown keys are
    /// preserved verbatim so the tree can be rebuilt.
    pub attributes: serde_json::Map<String, Value>,
    /// Name of the parent field this node sits under (`init`, `test`, ...).
    pub body: Option<String>,
    /// The parent stored this child in an array, even if singleton.
    pub body_list: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub control_dep_parents: Vec<Dependence>,
    pub control_dep_children: Vec<Dependence>,
    pub data_dep_parents: Vec<Dependence>,
    pub data_dep_children: Vec<Dependence>,
    pub statement_dep_parents: Vec<Dependence>,
    pub statement_dep_children: Vec<Dependence>,
    pub comment_dep_parents: Vec<Dependence>,
    pub comment_dep_children: Vec<Dependence>,
}

impl Node {
    fn new(id: NodeId, name: &str, parent: Option<NodeId>) -> Self {
        Self {
            id,
            name: name.to_owned(),
            attributes: serde_json::Map::new(),
            body: None,
            body_list: false,
            parent,
            children: Vec::new(),
            control_dep_parents: Vec::new(),
            control_dep_children: Vec::new(),
            data_dep_parents: Vec::new(),
            data_dep_children: Vec::new(),
            statement_dep_parents: Vec::new(),
            statement_dep_children: Vec::new(),
            comment_dep_parents: Vec::new(),
            comment_dep_children: Vec::new(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn is_statement(&self) -> bool {
        STATEMENTS.contains(&self.name.as_str())
    }

    pub fn is_comment(&self) -> bool {
        COMMENTS.contains(&self.name.as_str())
    }

    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }

    /// The `name` attribute of an `Identifier` node.
    pub fn identifier_name(&self) -> Option<&str> {
        self.attr_str("name")
    }

    pub fn is_computed(&self) -> bool {
        self.attr("computed").and_then(Value::as_bool).unwrap_or(false)
    }

    /// Sub-type of a `Literal` node, derived from its `value` attribute.
    pub fn literal_type(&self) -> Option<&'static str> {
        if let Some(value) = self.attributes.get("value") {
            match value {
                Value::String(_) => return Some("String"),
                Value::Number(n) if n.is_i64() || n.is_u64() => return Some("Int"),
                Value::Number(_) => return Some("Numeric"),
                Value::Bool(_) => return Some("Bool"),
                Value::Null => return Some("Null"),
                _ => {}
            }
        }
        if self.attributes.contains_key("regex") {
            return Some("RegExp");
        }
        if self.name != "Literal" {
            tracing::warn!("the node {} is not a Literal", self.name);
        } else {
            tracing::warn!(
                "the literal {:?} has an unknown type",
                self.attributes.get("raw")
            );
        }
        None
    }
}

/// The program dependency graph: an arena of nodes carrying the syntax tree
/// plus the mirrored control/data/statement/comment edge buckets.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Pdg {
    nodes: Vec<Node>,
}

impl Pdg {
    pub fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn add_node(&mut self, name: &str, parent: Option<NodeId>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node::new(id, name, parent));
        if let Some(p) = parent {
            self.nodes[p].children.push(id);
        }
        id
    }

    pub fn set_statement_dependency(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from]
            .statement_dep_children
            .push(Dependence::new(to, EdgeLabel::Epsilon));
        self.nodes[to]
            .statement_dep_parents
            .push(Dependence::new(from, EdgeLabel::Epsilon));
    }

    pub fn set_comment_dependency(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from]
            .comment_dep_children
            .push(Dependence::new(to, EdgeLabel::Epsilon));
        self.nodes[to]
            .comment_dep_parents
            .push(Dependence::new(from, EdgeLabel::Epsilon));
    }

    pub fn set_control_dependency(&mut self, from: NodeId, to: NodeId, label: EdgeLabel) {
        self.nodes[from]
            .control_dep_children
            .push(Dependence::new(to, label));
        self.nodes[to]
            .control_dep_parents
            .push(Dependence::new(from, label));
    }

    pub fn remove_control_dependency(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from]
            .control_dep_children
            .retain(|dep| dep.extremity != to);
        self.nodes[to]
            .control_dep_parents
            .retain(|dep| dep.extremity != from);
    }

    pub fn set_data_dependency(&mut self, from: NodeId, to: NodeId, begin: NodeId, end: NodeId) {
        self.nodes[from].data_dep_children.push(Dependence {
            extremity: to,
            label: EdgeLabel::Data,
            begin: Some(begin),
            end: Some(end),
        });
        self.nodes[to].data_dep_parents.push(Dependence {
            extremity: from,
            label: EdgeLabel::Data,
            begin: Some(begin),
            end: Some(end),
        });
    }
}

impl Index<NodeId> for Pdg {
    type Output = Node;
    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }
}

impl IndexMut<NodeId> for Pdg {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn edges_are_mirrored() {
        let mut g = Pdg::new();
        let a = g.add_node("ExpressionStatement", None);
        let b = g.add_node("ExpressionStatement", Some(a));
        g.set_control_dependency(a, b, EdgeLabel::Cond(true));
        g.set_data_dependency(a, b, a, b);

        assert_eq!(g[a].control_dep_children[0].extremity, b);
        assert_eq!(g[b].control_dep_parents[0].extremity, a);
        assert_eq!(
            g[a].control_dep_children[0].label,
            g[b].control_dep_parents[0].label
        );
        assert_eq!(g[a].data_dep_children[0].begin, Some(a));
        assert_eq!(g[b].data_dep_parents[0].end, Some(b));
    }

    #[test]
    fn remove_control_dependency_clears_both_sides() {
        let mut g = Pdg::new();
        let a = g.add_node("BlockStatement", None);
        let b = g.add_node("ExpressionStatement", Some(a));
        g.set_control_dependency(a, b, EdgeLabel::Epsilon);
        g.remove_control_dependency(a, b);
        assert!(g[a].control_dep_children.is_empty());
        assert!(g[b].control_dep_parents.is_empty());
    }

    #[test]
    fn statement_and_comment_kinds() {
        let mut g = Pdg::new();
        let s = g.add_node("IfStatement", None);
        let e = g.add_node("BinaryExpression", Some(s));
        let c = g.add_node("Line", Some(s));
        assert!(g[s].is_statement());
        assert!(!g[e].is_statement());
        assert!(g[c].is_comment());
    }

    #[test]
    fn literal_subtypes() {
        let mut g = Pdg::new();
        let l = g.add_node("Literal", None);
        g[l].attributes.insert("value".into(), json!("hi"));
        assert_eq!(g[l].literal_type(), Some("String"));
        g[l].attributes.insert("value".into(), json!(3));
        assert_eq!(g[l].literal_type(), Some("Int"));
        g[l].attributes.insert("value".into(), json!(3.25));
        assert_eq!(g[l].literal_type(), Some("Numeric"));
        g[l].attributes.insert("value".into(), json!(true));
        assert_eq!(g[l].literal_type(), Some("Bool"));
        g[l].attributes.remove("value");
        g[l].attributes
            .insert("regex".into(), json!({"pattern": "a+", "flags": ""}));
        assert_eq!(g[l].literal_type(), Some("RegExp"));
    }
}
