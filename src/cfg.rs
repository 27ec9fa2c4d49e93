use crate::node::{EdgeLabel, NodeId, Pdg};
use tracing::debug;

/// Forms whose children simply execute in sequence.
const EPSILON: &[&str] = &[
    "BlockStatement",
    "DebuggerStatement",
    "EmptyStatement",
    "ExpressionStatement",
    "LabeledStatement",
    "ReturnStatement",
    "ThrowStatement",
    "WithStatement",
    "CatchClause",
    "VariableDeclaration",
    "FunctionDeclaration",
];

/// Forms that branch on a condition.
const CONDITIONAL: &[&str] = &[
    "DoWhileStatement",
    "ForStatement",
    "ForOfStatement",
    "ForInStatement",
    "IfStatement",
    "SwitchCase",
    "SwitchStatement",
    "TryStatement",
    "WhileStatement",
    "ConditionalExpression",
];

const UNSTRUCTURED: &[&str] = &["BreakStatement", "ContinueStatement"];

/// Overlay control, statement and comment edges on the syntax tree.
///
/// Every statement-kind node gets outgoing edges according to its form;
/// unknown forms fall back to the sequencing rule. A malformed arity is
/// logged and skipped, never fatal.
pub fn build_cfg(g: &mut Pdg) {
    if !g.is_empty() {
        build_rec(g, g.root());
    }
    debug!(target: "cfg", nodes = g.len(), "CFG done");
}

fn build_rec(g: &mut Pdg, node: NodeId) {
    let children = g[node].children.clone();
    for child in children {
        let name = g[child].name.clone();
        if EPSILON.contains(&name.as_str()) || UNSTRUCTURED.contains(&name.as_str()) {
            epsilon_statement_cf(g, child);
            if name == "BreakStatement" {
                break_statement_cf(g, child);
            }
        } else if CONDITIONAL.contains(&name.as_str()) {
            conditional_statement_cf(g, child, &name);
        } else {
            // unlisted forms sequence like a block
            for gc in g[child].children.clone() {
                if g[gc].is_statement() {
                    g.set_control_dependency(child, gc, EdgeLabel::Epsilon);
                } else {
                    link_expression(g, child, gc);
                }
            }
        }
        build_rec(g, child);
    }
}

/// Non-statement child: statement edge, or comment edge for comment nodes.
fn link_expression(g: &mut Pdg, parent: NodeId, node: NodeId) {
    if g[node].is_comment() {
        g.set_comment_dependency(parent, node);
    } else {
        g.set_statement_dependency(parent, node);
    }
}

/// Comments sitting after the expected child count of a form.
fn extra_comment_node(g: &mut Pdg, node: NodeId, max_children: usize) {
    if let Some(&extra) = g[node].children.get(max_children)
        && g[extra].is_comment()
    {
        g.set_comment_dependency(node, extra);
    }
}

fn epsilon_statement_cf(g: &mut Pdg, node: NodeId) {
    for child in g[node].children.clone() {
        if g[child].is_statement() {
            g.set_control_dependency(node, child, EdgeLabel::Epsilon);
        } else {
            link_expression(g, node, child);
        }
    }
}

fn conditional_statement_cf(g: &mut Pdg, node: NodeId, name: &str) {
    match name {
        "DoWhileStatement" => do_while_cf(g, node),
        "ForStatement" | "ForOfStatement" | "ForInStatement" => for_cf(g, node),
        "IfStatement" | "ConditionalExpression" => if_cf(g, node),
        "WhileStatement" => while_cf(g, node),
        "TryStatement" => try_cf(g, node),
        "SwitchStatement" => switch_cf(g, node),
        "SwitchCase" => {} // wired by the enclosing SwitchStatement
        _ => {}
    }
}

/// `BreakStatement` rewiring: the sibling branches after the guarding
/// `IfStatement` become its `false` children instead of the block's epsilon
/// children. Applied only when the expected block -> if -> block chain of
/// control parents is present; anything else keeps its wiring.
fn break_statement_cf(g: &mut Pdg, node: NodeId) {
    let Some(block) = g[node].control_dep_parents.first().map(|d| d.extremity) else {
        debug!(target: "cfg", "break without a control parent, left as-is");
        return;
    };
    let Some(if_cond) = g[block].control_dep_parents.first().map(|d| d.extremity) else {
        return;
    };
    if g[if_cond].name != "IfStatement" {
        debug!(target: "cfg", "break not guarded by an IfStatement, left as-is");
        return;
    }
    let Some(outer) = g[if_cond].control_dep_parents.first().map(|d| d.extremity) else {
        return;
    };
    let siblings: Vec<NodeId> = g[outer]
        .control_dep_children
        .iter()
        .map(|d| d.extremity)
        .collect();
    let Some(pos) = siblings.iter().position(|&s| s == if_cond) else {
        return;
    };
    for &after in &siblings[pos + 1..] {
        g.set_control_dependency(if_cond, after, EdgeLabel::Cond(false));
        g.remove_control_dependency(outer, after);
    }
}

fn do_while_cf(g: &mut Pdg, node: NodeId) {
    // child 0: body, child 1: test
    let ch = g[node].children.clone();
    let (Some(&body), Some(&test)) = (ch.first(), ch.get(1)) else {
        debug!(target: "cfg", "do-while with missing children, skipped");
        return;
    };
    g.set_control_dependency(node, body, EdgeLabel::Cond(true));
    link_expression(g, node, test);
    extra_comment_node(g, node, 2);
}

fn for_cf(g: &mut Pdg, node: NodeId) {
    // for: init / test / update / body -- for-in, for-of: left / right / body
    let ch = g[node].children.clone();
    for &child in &ch {
        if g[child].body.as_deref() != Some("body") {
            link_expression(g, node, child);
        } else if !g[child].is_comment() {
            g.set_control_dependency(node, child, EdgeLabel::Cond(true));
        }
    }
    extra_comment_node(g, node, ch.len());
}

fn if_cf(g: &mut Pdg, node: NodeId) {
    // child 0: test, child 1: consequent, child 2: alternate
    let ch = g[node].children.clone();
    let (Some(&test), Some(&consequent)) = (ch.first(), ch.get(1)) else {
        debug!(target: "cfg", "if with missing children, skipped");
        return;
    };
    link_expression(g, node, test);
    g.set_control_dependency(node, consequent, EdgeLabel::Cond(true));
    if let Some(&alternate) = ch.get(2) {
        if g[alternate].is_comment() {
            g.set_comment_dependency(node, alternate);
        } else {
            g.set_control_dependency(node, alternate, EdgeLabel::Cond(false));
            extra_comment_node(g, node, 3);
        }
    }
}

fn try_cf(g: &mut Pdg, node: NodeId) {
    // child 0: block, child 1: handler or finalizer, child 2: finalizer
    let ch = g[node].children.clone();
    let Some(&block) = ch.first() else {
        debug!(target: "cfg", "try without a block, skipped");
        return;
    };
    g.set_control_dependency(node, block, EdgeLabel::Cond(true));
    if let Some(&second) = ch.get(1) {
        if g[second].body.as_deref() == Some("handler") {
            g.set_control_dependency(node, second, EdgeLabel::Cond(false));
        } else {
            g.set_control_dependency(node, second, EdgeLabel::Epsilon);
        }
    }
    if let Some(&third) = ch.get(2) {
        if g[third].body.as_deref() == Some("finalizer") {
            g.set_control_dependency(node, third, EdgeLabel::Epsilon);
            extra_comment_node(g, node, 3);
        } else {
            extra_comment_node(g, node, 2);
        }
    }
}

fn while_cf(g: &mut Pdg, node: NodeId) {
    // child 0: test, child 1: body
    let ch = g[node].children.clone();
    let (Some(&test), Some(&body)) = (ch.first(), ch.get(1)) else {
        debug!(target: "cfg", "while with missing children, skipped");
        return;
    };
    link_expression(g, node, test);
    g.set_control_dependency(node, body, EdgeLabel::Cond(true));
    extra_comment_node(g, node, 2);
}

fn switch_cf(g: &mut Pdg, node: NodeId) {
    // child 0: discriminant, children 1..: cases
    let cases = g[node].children.clone();
    let Some(&discriminant) = cases.first() else {
        debug!(target: "cfg", "switch without a discriminant, skipped");
        return;
    };
    link_expression(g, node, discriminant);
    if cases.len() > 1 {
        g.set_control_dependency(node, cases[1], EdgeLabel::Epsilon);
        switch_case_cf(g, cases[1], cases.len() == 2);
        for i in 2..cases.len() {
            if g[cases[i]].is_comment() {
                g.set_comment_dependency(node, cases[i]);
            } else {
                // the previous case falls through on a failed test
                g.set_control_dependency(cases[i - 1], cases[i], EdgeLabel::Cond(false));
                switch_case_cf(g, cases[i], i == cases.len() - 1);
            }
        }
    }
    // switch (x) {} is legal and gets only the discriminant edge
}

fn switch_case_cf(g: &mut Pdg, node: NodeId, last: bool) {
    // child 0: test (absent on the default case), children 1..: consequent
    let ch = g[node].children.clone();
    if ch.len() > 1 {
        let start = if last {
            0 // the last case runs unconditionally
        } else {
            link_expression(g, node, ch[0]);
            1
        };
        for &child in &ch[start..] {
            if g[child].is_comment() {
                g.set_comment_dependency(node, child);
            } else {
                g.set_control_dependency(node, child, EdgeLabel::Cond(true));
            }
        }
    } else if let Some(&only) = ch.first() {
        g.set_control_dependency(node, only, EdgeLabel::Cond(true));
    }
}
