use super::Level;
use crate::node::{Dependence, NodeId, Pdg};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

/// Which edge bucket a flow traversal follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Control,
    Data,
}

fn flow_deps<'g>(g: &'g Pdg, node: NodeId, flow: Flow) -> &'g [Dependence] {
    match flow {
        Flow::Control => &g[node].control_dep_children,
        Flow::Data => &g[node].data_dep_children,
    }
}

/// What a traversal emits at each stop. The walks are shared between the
/// plain-unit and the `(context, value)` streams; only the emission differs.
trait Emitter {
    /// The node's own feature during a syntactic pass.
    fn syntax(&mut self, g: &Pdg, node: NodeId);
    /// The feature of a node anchoring flow edges; `false` means nothing was
    /// emitted and the caller must not mark or descend the subtree.
    fn flow_head(&mut self, g: &Pdg, node: NodeId, flow: Flow) -> bool;
    /// The feature of an edge target reached without recursing into it.
    fn flow_target(&mut self, g: &Pdg, dep: &Dependence, flow: Flow);
}

/// Depth-first pre-order over syntactic children, de-duplicated by id. The
/// root's own name is never part of the stream.
fn ast_pass<E: Emitter>(g: &Pdg, node: NodeId, em: &mut E, handled: &mut HashSet<NodeId>) {
    for &child in &g[node].children {
        if handled.insert(child) {
            em.syntax(g, child);
            ast_pass(g, child, em, handled);
        }
    }
}

/// Outer sweep over syntactic children so unreachable code is still covered
/// while the inner walk follows flow edges.
fn flow_pass<E: Emitter>(
    g: &Pdg,
    node: NodeId,
    flow: Flow,
    em: &mut E,
    handled: &mut HashSet<NodeId>,
    handled_features: &mut HashSet<NodeId>,
) {
    for &child in &g[node].children {
        if !handled.contains(&child) {
            traverse_flow(g, child, flow, em, handled, handled_features);
        }
        flow_pass(g, child, flow, em, handled, handled_features);
    }
}

fn traverse_flow<E: Emitter>(
    g: &Pdg,
    node: NodeId,
    flow: Flow,
    em: &mut E,
    handled: &mut HashSet<NodeId>,
    handled_features: &mut HashSet<NodeId>,
) {
    if !flow_deps(g, node, flow).is_empty() && em.flow_head(g, node, flow) {
        handled_features.insert(node);
        ast_pass(g, node, em, handled_features);
    }
    for dep in flow_deps(g, node, flow).to_vec() {
        let target = dep.extremity;
        // a target with no further flow edges (or one already walked) would
        // otherwise never surface in the stream
        if flow_deps(g, target, flow).is_empty() || handled.contains(&target) {
            em.flow_target(g, &dep, flow);
        }
        if handled.insert(target) {
            handled_features.insert(target);
            ast_pass(g, target, em, handled_features);
            traverse_flow(g, target, flow, em, handled, handled_features);
        }
    }
}

fn run<E: Emitter>(g: &Pdg, level: Level, em: &mut E) {
    if g.is_empty() {
        return;
    }
    let root = g.root();
    match level {
        Level::Tokens => debug!(target: "features", "token streams come from the tokenizer"),
        Level::Ast => {
            if g[root].is_leaf() {
                debug!(target: "features", "empty AST");
            }
            ast_pass(g, root, em, &mut HashSet::new());
        }
        Level::Cfg => flow_pass(
            g,
            root,
            Flow::Control,
            em,
            &mut HashSet::new(),
            &mut HashSet::new(),
        ),
        Level::PdgDfg => flow_pass(
            g,
            root,
            Flow::Data,
            em,
            &mut HashSet::new(),
            &mut HashSet::new(),
        ),
        Level::Pdg => {
            // each pass keeps its own visited set, nothing is shared
            flow_pass(
                g,
                root,
                Flow::Data,
                em,
                &mut HashSet::new(),
                &mut HashSet::new(),
            );
            flow_pass(
                g,
                root,
                Flow::Control,
                em,
                &mut HashSet::new(),
                &mut HashSet::new(),
            );
        }
        Level::PdgCfgAst => {
            let mut data_features = HashSet::new();
            let mut control_features = HashSet::new();
            flow_pass(g, root, Flow::Data, em, &mut HashSet::new(), &mut data_features);
            flow_pass(
                g,
                root,
                Flow::Control,
                em,
                &mut HashSet::new(),
                &mut control_features,
            );
            let mut emitted: HashSet<NodeId> =
                data_features.union(&control_features).copied().collect();
            ast_pass(g, root, em, &mut emitted);
        }
        Level::PdgAst => {
            let mut data_features = HashSet::new();
            flow_pass(g, root, Flow::Data, em, &mut HashSet::new(), &mut data_features);
            ast_pass(g, root, em, &mut data_features);
        }
    }
}

// ---------------------------------------------------------------------------
// Plain units
// ---------------------------------------------------------------------------

struct UnitEmitter {
    out: Vec<String>,
}

impl Emitter for UnitEmitter {
    fn syntax(&mut self, g: &Pdg, node: NodeId) {
        self.out.push(g[node].name.clone());
    }

    fn flow_head(&mut self, g: &Pdg, node: NodeId, _flow: Flow) -> bool {
        self.out.push(g[node].name.clone());
        true
    }

    fn flow_target(&mut self, g: &Pdg, dep: &Dependence, _flow: Flow) {
        self.out.push(g[dep.extremity].name.clone());
    }
}

/// The ordered unit-name stream of a graph at the given level.
pub fn syntactic_units(g: &Pdg, level: Level) -> Vec<String> {
    let mut em = UnitEmitter { out: Vec::new() };
    run(g, level, &mut em);
    em.out
}

// ---------------------------------------------------------------------------
// (context, value) pairs
// ---------------------------------------------------------------------------

struct ValueEmitter {
    out: Vec<(String, Option<String>)>,
}

impl Emitter for ValueEmitter {
    fn syntax(&mut self, g: &Pdg, node: NodeId) {
        if g[node].name == "Literal" {
            if let Some(context) = g[node].literal_type()
                && let Some(value) = g[node].attr("value")
            {
                self.out.push((context.to_owned(), Some(display_value(value))));
            }
        } else if let Some(pair) = context_value(g, node) {
            self.out.push(pair);
        }
    }

    fn flow_head(&mut self, g: &Pdg, node: NodeId, flow: Flow) -> bool {
        match flow {
            Flow::Control => match context_value(g, node) {
                Some(pair) => {
                    self.out.push(pair);
                    true
                }
                None => false,
            },
            Flow::Data => {
                let begin = g[node]
                    .data_dep_children
                    .first()
                    .and_then(|dep| dep.begin);
                let value = begin.and_then(|b| leaf_attr(g, b));
                self.out.push((g[node].name.clone(), value));
                true
            }
        }
    }

    fn flow_target(&mut self, g: &Pdg, dep: &Dependence, flow: Flow) {
        match flow {
            Flow::Control => {
                if let Some(pair) = context_value(g, dep.extremity) {
                    self.out.push(pair);
                }
            }
            Flow::Data => {
                let value = dep.end.and_then(|e| leaf_attr(g, e));
                self.out.push((g[dep.extremity].name.clone(), value));
            }
        }
    }
}

/// The ordered `(context, value)` stream of a graph at the given level.
pub fn value_units(g: &Pdg, level: Level) -> Vec<(String, Option<String>)> {
    let mut em = ValueEmitter { out: Vec::new() };
    run(g, level, &mut em);
    em.out
}

/// The node's name paired with its first descendant identifier's name.
fn context_value(g: &Pdg, node: NodeId) -> Option<(String, Option<String>)> {
    let mut identifiers = Vec::new();
    search_identifier(g, node, &mut identifiers);
    let &first = identifiers.first()?;
    let value = g[first].identifier_name().map(str::to_owned);
    Some((g[node].name.clone(), value))
}

fn search_identifier(g: &Pdg, node: NodeId, out: &mut Vec<NodeId>) {
    if g[node].name == "Identifier" {
        out.push(node);
    }
    for &child in &g[node].children {
        if g[child].name == "Identifier" {
            out.push(child);
        } else {
            search_identifier(g, child, out);
        }
    }
}

/// A leaf's `value` (literals) or `name` (identifiers).
fn leaf_attr(g: &Pdg, node: NodeId) -> Option<String> {
    if let Some(value) = g[node].attr("value") {
        return Some(display_value(value));
    }
    g[node].identifier_name().map(str::to_owned)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ast_to_pdg;
    use crate::cfg::build_cfg;
    use crate::dfg::add_data_flow;
    use serde_json::json;
    use std::path::Path;

    fn var_x_graph() -> Pdg {
        let mut g = ast_to_pdg(&json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "x"},
                     "init": {"type": "Literal", "value": 1, "raw": "1"}}
                ], "kind": "var"}
            ],
            "sourceType": "script"
        }))
        .unwrap();
        build_cfg(&mut g);
        g
    }

    #[test]
    fn ast_stream_skips_the_root() {
        let g = var_x_graph();
        assert_eq!(
            syntactic_units(&g, Level::Ast),
            [
                "VariableDeclaration",
                "VariableDeclarator",
                "Identifier",
                "Literal"
            ]
        );
    }

    #[test]
    fn streams_are_deterministic() {
        let mut g = ast_to_pdg(&json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "x"},
                     "init": {"type": "Literal", "value": 1, "raw": "1"}}
                ], "kind": "var"},
                {"type": "ExpressionStatement", "expression": {
                    "type": "AssignmentExpression", "operator": "=",
                    "left": {"type": "Identifier", "name": "x"},
                    "right": {"type": "BinaryExpression", "operator": "+",
                        "left": {"type": "Identifier", "name": "x"},
                        "right": {"type": "Literal", "value": 1, "raw": "1"}}
                }}
            ],
            "sourceType": "script"
        }))
        .unwrap();
        build_cfg(&mut g);
        add_data_flow(&mut g, Path::new("t.js"), None).unwrap();
        for level in [Level::Ast, Level::Cfg, Level::PdgDfg, Level::Pdg, Level::PdgCfgAst] {
            assert_eq!(
                syntactic_units(&g, level),
                syntactic_units(&g, level),
                "unit stream for {level:?}"
            );
            assert_eq!(value_units(&g, level), value_units(&g, level));
        }
    }

    #[test]
    fn dfg_stream_follows_data_edges() {
        let mut g = ast_to_pdg(&json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "x"},
                     "init": {"type": "Literal", "value": 1, "raw": "1"}}
                ], "kind": "var"},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "use"},
                    "arguments": [{"type": "Identifier", "name": "x"}]}}
            ],
            "sourceType": "script"
        }))
        .unwrap();
        build_cfg(&mut g);
        add_data_flow(&mut g, Path::new("t.js"), None).unwrap();

        let units = syntactic_units(&g, Level::PdgDfg);
        // the declaration anchors a data edge: its name, its subtree, then
        // the edge target
        let decl = units
            .iter()
            .position(|u| u == "VariableDeclaration")
            .unwrap();
        let target = units
            .iter()
            .position(|u| u == "ExpressionStatement")
            .unwrap();
        assert!(decl < target);

        let pairs = value_units(&g, Level::PdgDfg);
        assert!(
            pairs
                .iter()
                .any(|(c, v)| c == "VariableDeclaration" && v.as_deref() == Some("x"))
        );
    }

    #[test]
    fn value_stream_uses_literal_subtypes() {
        let g = var_x_graph();
        let pairs = value_units(&g, Level::Ast);
        assert!(pairs.contains(&("Int".to_owned(), Some("1".to_owned()))));
        assert!(
            pairs
                .iter()
                .any(|(c, v)| c == "VariableDeclaration" && v.as_deref() == Some("x"))
        );
    }
}
