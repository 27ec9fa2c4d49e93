use crate::errors::{ArgusError, ArgusResult};
use crate::node::{EdgeLabel, NodeId, Pdg};
use crate::scopes::VarList;
use crate::syntax::is_reserved;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Global,
    Local,
}

/// Cooperative wall-clock cap, checked at statement boundaries.
struct Deadline {
    end: Option<Instant>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            end: limit.map(|d| Instant::now() + d),
        }
    }

    fn check(&self, file: &Path) -> ArgusResult<()> {
        match self.end {
            Some(end) if Instant::now() >= end => Err(ArgusError::Timeout(file.to_owned())),
            _ => Ok(()),
        }
    }
}

/// Walk up to the statement node that carries `node` in the graph.
pub(crate) fn nearest_statement(g: &Pdg, node: NodeId) -> NodeId {
    let mut current = node;
    loop {
        if g[current].is_statement() {
            return current;
        }
        if g[current].statement_dep_parents.len() > 1 {
            warn!(
                "several statement dependencies join on the same node {}",
                g[current].name
            );
        }
        match g[current].parent {
            Some(parent) => current = parent,
            None => return current,
        }
    }
}

/// The definer identifiers a use of slot `index` must link back to: the
/// forced targets recorded at a branch merge, or the slot's latest writer.
fn begins(list: &VarList, index: usize) -> Vec<NodeId> {
    match list.forced_targets(index) {
        Some(targets) => targets.to_vec(),
        None => vec![list.var(index)],
    }
}

struct DfgBuilder<'g> {
    g: &'g mut Pdg,
    glob: VarList,
    unknown: Vec<NodeId>,
    handled: HashSet<NodeId>,
    deadline: Deadline,
    file: PathBuf,
}

/// Add data-flow edges to a graph that already carries control and statement
/// edges. Returns the identifier nodes whose uses never found a definition.
pub fn add_data_flow(
    g: &mut Pdg,
    file: &Path,
    timeout: Option<Duration>,
) -> ArgusResult<Vec<NodeId>> {
    if g.is_empty() {
        return Ok(Vec::new());
    }
    let mut b = DfgBuilder {
        g,
        glob: VarList::new(),
        unknown: Vec::new(),
        handled: HashSet::new(),
        deadline: Deadline::new(timeout),
        file: file.to_owned(),
    };
    let mut loc = VarList::new();
    let root = b.g.root();
    for child in b.g[root].children.clone() {
        loc = b.build_dfg(child, loc, Scope::Global)?;
    }
    for &u in &b.unknown {
        warn!(
            "the variable {} is not declared",
            b.g[u].identifier_name().unwrap_or("<unnamed>")
        );
    }
    Ok(b.unknown)
}

impl DfgBuilder<'_> {
    fn build_dfg(&mut self, node: NodeId, mut loc: VarList, entry: Scope) -> ArgusResult<VarList> {
        let name = self.g[node].name.clone();
        match name.as_str() {
            "VariableDeclaration" => {
                if self.g[node].attr_str("kind") != Some("var") {
                    // let/const: remember the pre-block bindings so the block
                    // exit can pop them
                    if loc.before_limit_empty() {
                        loc.fill_before_limit();
                    }
                    for child in self.g[node].children.clone() {
                        loc = self.var_declaration_df(child, loc, entry, true)?;
                    }
                    loc.limited.limit = true;
                    for v in loc.vars().to_vec() {
                        if !loc.in_before_limit(v) && !loc.in_after_limit(v) {
                            debug!(target: "dfg", "block-limited binding recorded");
                            loc.add_limited(v);
                        }
                    }
                } else {
                    for child in self.g[node].children.clone() {
                        loc = self.var_declaration_df(child, loc, entry, false)?;
                    }
                }
                Ok(loc)
            }
            "AssignmentExpression" => self.assignment_expr_df(node, loc, entry, false),
            "CallExpression" if self.member_call(node) => {
                self.assignment_expr_df(node, loc, entry, true)
            }
            "UpdateExpression" => {
                self.update_expr_df(node, &mut loc, entry);
                Ok(loc)
            }
            "FunctionDeclaration" => self.function_scope(node, loc, false),
            "FunctionExpression" => self.function_scope(node, loc, true),
            _ if self.g[node].is_statement() => self.statement_scope(node, loc, entry),
            "ObjectExpression" => self.obj_expr_scope(node, loc),
            "Identifier" => {
                self.build_df_identifier(node, &mut loc, entry);
                Ok(loc)
            }
            _ => {
                for child in self.g[node].children.clone() {
                    loc = self.build_dfg(child, loc, entry)?;
                }
                Ok(loc)
            }
        }
    }

    /// `obj.m(...)` where `obj` is an object the call may mutate.
    fn member_call(&self, node: NodeId) -> bool {
        let Some(&callee) = self.g[node].children.first() else {
            return false;
        };
        if self.g[callee].name != "MemberExpression" {
            return false;
        }
        let Some(&object) = self.g[callee].children.first() else {
            return false;
        };
        let plain = self.g[object].name != "ThisExpression" && !self.has_window_attr(object);
        let nested = self.g[callee]
            .parent
            .is_some_and(|p| self.g[p].name == "MemberExpression");
        plain || nested
    }

    fn has_window_attr(&self, node: NodeId) -> bool {
        self.g[node].attributes.values().any(|v| v == "window")
    }

    /// Fan one use into data edges from every reaching definer.
    fn set_df_from(&mut self, begins: Vec<NodeId>, identifier: NodeId) {
        let use_stmt = nearest_statement(self.g, identifier);
        for begin in begins {
            let def_stmt = nearest_statement(self.g, begin);
            self.g
                .set_data_dependency(def_stmt, use_stmt, begin, identifier);
        }
    }

    /// A read of `identifier`: link it to its reaching definition, or record
    /// it as unknown for later hoisting.
    fn assignment_df(&mut self, identifier: NodeId, loc: &mut VarList) {
        if let Some(index) = loc.position(self.g, identifier) {
            debug!(target: "dfg", "local variable used");
            let begins = begins(loc, index);
            self.set_df_from(begins, identifier);
        } else if let Some(index) = self.glob.position(self.g, identifier) {
            debug!(target: "dfg", "global variable used");
            let begins = begins(&self.glob, index);
            self.set_df_from(begins, identifier);
        } else if let Some(name) = self.g[identifier].identifier_name()
            && !is_reserved(name)
        {
            self.unknown.push(identifier);
        }
    }

    /// A write of `identifier`: declare it, or replace the slot of its last
    /// definition. Object mutations (`obj = true`) first link the read of the
    /// pre-update value.
    fn var_decl_df(
        &mut self,
        node: NodeId,
        loc: &mut VarList,
        entry: Scope,
        assignt: bool,
        obj: bool,
        block_scoped: bool,
    ) {
        let use_glob = if !assignt && block_scoped {
            false
        } else {
            entry == Scope::Global || (assignt && loc.position(self.g, node).is_none())
        };

        let mut glob = std::mem::take(&mut self.glob);
        {
            let list: &mut VarList = if use_glob { &mut glob } else { loc };
            match list.position(self.g, node) {
                None => {
                    debug!(target: "dfg", "variable declared");
                    list.add_var(node);
                }
                Some(index) => {
                    if assignt && obj {
                        // the object is read before it is modified
                        debug!(target: "dfg", "object used and modified");
                        let begins = begins(list, index);
                        self.set_df_from(begins, node);
                    }
                    list.update_var(index, node);
                }
            }
        }
        self.glob = glob;
    }

    fn var_declaration_df(
        &mut self,
        node: NodeId,
        mut loc: VarList,
        entry: Scope,
        block_scoped: bool,
    ) -> ArgusResult<VarList> {
        if self.g[node].name != "VariableDeclarator" {
            // could be a comment between declarators
            return Ok(loc);
        }
        let children = self.g[node].children.clone();
        let Some(&target) = children.first() else {
            warn!("declarator without a target");
            return Ok(loc);
        };
        let identifiers = self.search_identifiers(target, true, true);
        if identifiers.is_empty() {
            warn!("no identifier variable found");
        }
        for decl in identifiers {
            self.handled.insert(decl);
            self.var_decl_df(decl, &mut loc, entry, false, false, block_scoped);
        }
        if children.len() > 1 {
            loc = self.build_dfg(children[1], loc, entry)?;
        } else {
            debug!(target: "dfg", "variable not initialized");
        }
        Ok(loc)
    }

    /// Collect the identifier nodes a definition or use refers to. Member
    /// accesses keep only the object (or the property behind `this`/`window`);
    /// object-expression properties are skipped entirely.
    fn search_identifiers(&mut self, node: NodeId, rec: bool, mark: bool) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.search_identifiers_into(node, rec, mark, &mut out);
        out
    }

    fn search_identifiers_into(
        &mut self,
        node: NodeId,
        rec: bool,
        mark: bool,
        out: &mut Vec<NodeId>,
    ) {
        let name = self.g[node].name.clone();
        if name == "ObjectExpression" {
            return;
        }
        if name == "Identifier" {
            if let Some(parent) = self.g[node].parent
                && self.g[parent].name == "MemberExpression"
            {
                let siblings = self.g[parent].children.clone();
                if siblings.first() == Some(&node) {
                    let id_name = self.g[node].identifier_name().unwrap_or_default();
                    if id_name == "this" || id_name == "window" {
                        debug!(target: "dfg", "{} is not the variable's name", id_name);
                        if mark {
                            self.handled.insert(node);
                        }
                        if let Some(&prop) = siblings.get(1)
                            && self.g[prop].name == "Identifier"
                        {
                            out.push(prop);
                        }
                    } else {
                        out.push(node);
                    }
                } else if siblings
                    .first()
                    .is_some_and(|&s| self.g[s].name == "ThisExpression")
                {
                    out.push(node);
                } else if self.g[parent].is_computed() {
                    // table access, the index may be a variable
                    out.push(node);
                }
                return;
            }
            out.push(node);
            return;
        }
        if rec {
            for child in self.g[node].children.clone() {
                self.search_identifiers_into(child, rec, mark, out);
            }
        }
    }

    fn assignment_expr_df(
        &mut self,
        node: NodeId,
        mut loc: VarList,
        entry: Scope,
        call_expr: bool,
    ) -> ArgusResult<VarList> {
        let children = self.g[node].children.clone();

        // right-hand side first, so its uses see the pre-assignment state
        for &rhs in children.iter().skip(1) {
            loc = self.build_dfg(rhs, loc, entry)?;
        }

        let Some(&lhs) = children.first() else {
            warn!("assignment without a target");
            return Ok(loc);
        };
        let assignees = self.search_identifiers(lhs, true, true);
        if assignees.is_empty() {
            warn!("no identifier assignee found");
        }
        for assignee in assignees {
            self.handled.insert(assignee);
            if self.member_object_assignee(assignee) {
                let computed = self.g[assignee]
                    .parent
                    .is_some_and(|p| self.g[p].is_computed());
                if computed {
                    self.assignment_df(assignee, &mut loc);
                } else if !call_expr
                    || loc.position(self.g, assignee).is_some()
                    || self.glob.position(self.g, assignee).is_some()
                {
                    // only mutate objects a call can reach; this skips
                    // console.log and friends
                    self.var_decl_df(assignee, &mut loc, entry, true, true, false);
                }
            } else {
                self.var_decl_df(assignee, &mut loc, entry, true, false, false);
            }

            // compound assignment also reads the target
            if let Some(parent) = self.g[assignee].parent
                && let Some(op) = self.g[parent].attr_str("operator").map(str::to_owned)
                && op != "="
            {
                self.assignment_df(assignee, &mut loc);
            }
        }
        Ok(loc)
    }

    /// An assignee under a `MemberExpression` that denotes an object (and not
    /// `this.x` / `window.x`), so the write is an object mutation.
    fn member_object_assignee(&self, assignee: NodeId) -> bool {
        let Some(parent) = self.g[assignee].parent else {
            return false;
        };
        if self.g[parent].name != "MemberExpression" {
            return false;
        }
        let plain = self.g[parent].children.first().is_some_and(|&first| {
            self.g[first].name != "ThisExpression" && !self.has_window_attr(first)
        });
        let nested = self.g[parent]
            .parent
            .is_some_and(|pp| self.g[pp].name == "MemberExpression");
        plain || nested
    }

    /// `++`/`--`: the argument is use, then def, then use again.
    fn update_expr_df(&mut self, node: NodeId, loc: &mut VarList, entry: Scope) {
        let Some(&target) = self.g[node].children.first() else {
            return;
        };
        let arguments = self.search_identifiers(target, true, true);
        if arguments.is_empty() {
            warn!("no identifier assignee found");
        }
        for argument in arguments {
            self.assignment_df(argument, loc);
            self.var_decl_df(argument, loc, entry, true, false, false);
            self.assignment_df(argument, loc);
        }
    }

    fn build_df_identifier(&mut self, node: NodeId, loc: &mut VarList, entry: Scope) {
        if self.handled.contains(&node) {
            debug!(target: "dfg", "identifier already handled");
            return;
        }
        // rec = false: the traversal reaches nested identifiers on its own
        let identifiers = self.search_identifiers(node, false, true);
        for identifier in identifiers {
            let in_catch = self.g[identifier]
                .parent
                .is_some_and(|p| self.g[p].name == "CatchClause");
            if in_catch {
                // catch (e) binds e right here
                self.var_decl_df(identifier, loc, entry, false, false, false);
            } else {
                self.assignment_df(identifier, loc);
            }
        }
    }

    /// New function scope: clone the environment, declare the name in the
    /// *outer* scope (declarations only) and the parameters in the clone.
    fn function_scope(
        &mut self,
        node: NodeId,
        loc: VarList,
        fun_expr: bool,
    ) -> ArgusResult<VarList> {
        self.deadline.check(&self.file)?;
        let mut outer = loc.snapshot();
        let mut inner = loc;
        for child in self.g[node].children.clone() {
            let body = self.g[child].body.clone();
            match body.as_deref() {
                Some("id") | Some("params") => {
                    let is_name = body.as_deref() == Some("id");
                    let identifiers = self.search_identifiers(child, true, true);
                    for param in identifiers {
                        self.handled.insert(param);
                        if is_name && !fun_expr {
                            // visible to later siblings, and to the body for
                            // recursion
                            self.var_decl_df(param, &mut outer, Scope::Local, false, false, false);
                            inner = outer.snapshot();
                            self.hoisting(param);
                        } else {
                            self.var_decl_df(param, &mut inner, Scope::Local, false, false, false);
                        }
                    }
                }
                _ => {
                    inner = self.build_dfg(child, inner, Scope::Local)?;
                }
            }
        }
        if fun_expr {
            let _ = self.link_fun_expr(node);
        }
        inner.limit_scope();
        Ok(outer)
    }

    /// Resolve unknown uses that were in fact calls to this hoisted function.
    fn hoisting(&mut self, node: NodeId) {
        let Some(name) = self.g[node].identifier_name().map(str::to_owned) else {
            return;
        };
        for u in self.unknown.clone() {
            if self.g[u].identifier_name() == Some(name.as_str()) {
                debug!(
                    target: "dfg",
                    "the function {} was used before its definition", name
                );
                let from = nearest_statement(self.g, node);
                let to = nearest_statement(self.g, u);
                self.g.set_data_dependency(from, to, node, u);
                self.unknown.retain(|&x| x != u);
            }
        }
    }

    /// Find the variable a function expression is stored in, walking up to
    /// the enclosing declarator/assignment/property (never past a call).
    fn link_fun_expr(&mut self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        while !matches!(
            self.g[current].name.as_str(),
            "VariableDeclarator" | "AssignmentExpression" | "Property" | "Program"
        ) {
            if self.g[current].name == "CallExpression" {
                break;
            }
            match self.g[current].parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        if !matches!(
            self.g[current].name.as_str(),
            "VariableDeclarator" | "AssignmentExpression" | "Property"
        ) {
            return None;
        }
        let children = self.g[current].children.clone();
        if children.len() < 2 {
            return None;
        }
        let variables = self.search_identifiers(children[0], true, false);
        let mut functions = Vec::new();
        search_function_expression(self.g, children[1], &mut functions);
        let position = functions.iter().position(|&f| f == node)?;
        if variables.len() != functions.len() {
            warn!(
                "trying to map {} function expressions to {} declarations",
                functions.len(),
                variables.len()
            );
            return None;
        }
        let def = variables[position];
        debug!(
            target: "dfg",
            "the variable {} refers to a function expression",
            self.g[def].identifier_name().unwrap_or("<unnamed>")
        );
        Some(def)
    }

    /// Property keys live in a private sub-scope; values see the outer one.
    fn obj_expr_scope(&mut self, node: NodeId, loc: VarList) -> ArgusResult<VarList> {
        let outer = loc.snapshot();
        let mut inner = loc;
        for prop in self.g[node].children.clone() {
            for child in self.g[prop].children.clone() {
                if self.g[child].body.as_deref() == Some("key") {
                    let identifiers = self.search_identifiers(child, true, true);
                    for param in identifiers {
                        self.handled.insert(param);
                        self.var_decl_df(param, &mut inner, Scope::Local, false, false, false);
                        self.hoisting(param);
                    }
                } else {
                    inner = self.build_dfg(child, inner, Scope::Local)?;
                }
            }
        }
        inner.limit_scope();
        Ok(outer)
    }

    /// Statement node: run statement/epsilon children in order, then explore
    /// each branch side on its own clone of the environment and merge.
    fn statement_scope(
        &mut self,
        node: NodeId,
        mut loc: VarList,
        entry: Scope,
    ) -> ArgusResult<VarList> {
        self.deadline.check(&self.file)?;

        for dep in self.g[node].statement_dep_children.clone() {
            loc = self.build_dfg(dep.extremity, loc, entry)?;
        }

        let mut todo_true = Vec::new();
        let mut todo_false = Vec::new();
        for dep in self.g[node].control_dep_children.clone() {
            match dep.label {
                EdgeLabel::Cond(true) => todo_true.push(dep.extremity),
                EdgeLabel::Cond(false) => todo_false.push(dep.extremity),
                _ => {
                    loc = self.build_dfg(dep.extremity, loc, entry)?;
                }
            }
        }

        if !todo_true.is_empty() || !todo_false.is_empty() {
            let before_loc = loc.snapshot();
            let before_glob = self.glob.snapshot();

            for n in todo_true {
                loc = self.build_dfg(n, loc, entry)?;
            }

            let mut false_loc = before_loc.snapshot();
            let saved_glob = std::mem::replace(&mut self.glob, before_glob.snapshot());
            for n in todo_false {
                false_loc = self.build_dfg(n, false_loc, entry)?;
            }
            let false_glob = std::mem::replace(&mut self.glob, saved_glob);

            if !loc.is_equal(&false_loc) {
                self.merge_branches(&before_loc, &mut loc, &false_loc);
            }
            if !self.glob.is_equal(&false_glob) {
                let mut glob = std::mem::take(&mut self.glob);
                self.merge_branches(&before_glob, &mut glob, &false_glob);
                self.glob = glob;
            }
        }

        if self.g[node].name == "BlockStatement" {
            loc.limit_scope();
        }
        Ok(loc)
    }

    /// Merge the false branch's bindings into the true branch's list. The
    /// side that wrote a slot wins; when both wrote, the slot records both
    /// definers so later uses fan in one edge per side.
    fn merge_branches(&mut self, before: &VarList, true_list: &mut VarList, false_list: &VarList) {
        for node_false in false_list.vars().to_vec() {
            let Some(false_name) = self.g[node_false].identifier_name().map(str::to_owned) else {
                continue;
            };
            let known = true_list
                .vars()
                .iter()
                .any(|&t| self.g[t].identifier_name() == Some(false_name.as_str()));
            if !known {
                debug!(target: "dfg", "variable {} added to the merged list", false_name);
                true_list.add_var(node_false);
            }
            let positions: Vec<usize> = true_list
                .vars()
                .iter()
                .enumerate()
                .filter(|&(_, &t)| {
                    t != node_false && self.g[t].identifier_name() == Some(false_name.as_str())
                })
                .map(|(i, _)| i)
                .collect();
            for index in positions {
                let node_true = true_list.var(index);
                if before.contains_id(node_true) {
                    // only the false side rewrote it
                    true_list.update_var(index, node_false);
                } else if before.contains_id(node_false) {
                    // only the true side rewrote it; nothing to do
                } else {
                    true_list.force_targets(index, vec![node_true, node_false]);
                }
            }
        }
    }
}

fn search_function_expression(g: &Pdg, node: NodeId, out: &mut Vec<NodeId>) {
    if g[node].name == "FunctionExpression" {
        out.push(node);
    } else {
        for &child in &g[node].children {
            search_function_expression(g, child, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ast_to_pdg;
    use crate::cfg::build_cfg;
    use serde_json::json;

    fn pdg(ast: serde_json::Value) -> (Pdg, Vec<NodeId>) {
        let mut g = ast_to_pdg(&ast).unwrap();
        build_cfg(&mut g);
        let unknown = add_data_flow(&mut g, Path::new("test.js"), None).unwrap();
        (g, unknown)
    }

    fn data_edge_count(g: &Pdg) -> usize {
        g.nodes().map(|n| n.data_dep_children.len()).sum()
    }

    #[test]
    fn declaration_reaches_the_assignment() {
        // var x = 1; x = x + 1;
        let (g, unknown) = pdg(json!({
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
        }));
        // 1 = VariableDeclaration, 3 = declarator id, 5 = the statement,
        // 9 = the right-hand use of x
        assert!(unknown.is_empty());
        assert_eq!(data_edge_count(&g), 1);
        let dep = &g[1].data_dep_children[0];
        assert_eq!(dep.extremity, 5);
        assert_eq!(dep.begin, Some(3));
        assert_eq!(dep.end, Some(9));
    }

    #[test]
    fn both_branch_definitions_reach_the_use() {
        // if (c) { y = 1; } else { y = 2; } use(y);
        let (g, _) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "IfStatement",
                 "test": {"type": "Identifier", "name": "c"},
                 "consequent": {"type": "BlockStatement", "body": [
                     {"type": "ExpressionStatement", "expression": {
                         "type": "AssignmentExpression", "operator": "=",
                         "left": {"type": "Identifier", "name": "y"},
                         "right": {"type": "Literal", "value": 1, "raw": "1"}}}
                 ]},
                 "alternate": {"type": "BlockStatement", "body": [
                     {"type": "ExpressionStatement", "expression": {
                         "type": "AssignmentExpression", "operator": "=",
                         "left": {"type": "Identifier", "name": "y"},
                         "right": {"type": "Literal", "value": 2, "raw": "2"}}}
                 ]}},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "use"},
                    "arguments": [{"type": "Identifier", "name": "y"}]}}
            ],
            "sourceType": "script"
        }));
        // 4 and 9 are the branch statements, 13 the use site
        let incoming = &g[13].data_dep_parents;
        assert_eq!(incoming.len(), 2);
        let mut froms: Vec<_> = incoming.iter().map(|d| d.extremity).collect();
        froms.sort_unstable();
        assert_eq!(froms, [4, 9]);
    }

    #[test]
    fn parameters_and_call_sites_are_linked() {
        // function f(a) { return a; } f(3);
        let (g, unknown) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "FunctionDeclaration",
                 "id": {"type": "Identifier", "name": "f"},
                 "params": [{"type": "Identifier", "name": "a"}],
                 "body": {"type": "BlockStatement", "body": [
                     {"type": "ReturnStatement",
                      "argument": {"type": "Identifier", "name": "a"}}
                 ]},
                 "generator": false, "expression": false, "async": false},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "f"},
                    "arguments": [{"type": "Literal", "value": 3, "raw": "3"}]}}
            ],
            "sourceType": "script"
        }));
        assert!(unknown.is_empty());
        assert_eq!(data_edge_count(&g), 2);
        // 1 = function declaration, 3 = param a, 5 = return, 6 = use of a
        let to_return = g[1]
            .data_dep_children
            .iter()
            .find(|d| d.extremity == 5)
            .unwrap();
        assert_eq!(to_return.begin, Some(3));
        assert_eq!(to_return.end, Some(6));
        // 2 = the function name, 7 = the call statement, 9 = callee use
        let to_call = g[1]
            .data_dep_children
            .iter()
            .find(|d| d.extremity == 7)
            .unwrap();
        assert_eq!(to_call.begin, Some(2));
        assert_eq!(to_call.end, Some(9));
    }

    #[test]
    fn inner_let_does_not_shadow_past_its_block() {
        // let x = 0; { let x = 1; } x;
        let (g, unknown) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "x"},
                     "init": {"type": "Literal", "value": 0, "raw": "0"}}
                ], "kind": "let"},
                {"type": "BlockStatement", "body": [
                    {"type": "VariableDeclaration", "declarations": [
                        {"type": "VariableDeclarator",
                         "id": {"type": "Identifier", "name": "x"},
                         "init": {"type": "Literal", "value": 1, "raw": "1"}}
                    ], "kind": "let"}
                ]},
                {"type": "ExpressionStatement",
                 "expression": {"type": "Identifier", "name": "x"}}
            ],
            "sourceType": "script"
        }));
        assert!(unknown.is_empty());
        // 1 = outer declaration, 3 = its identifier, 10 = the final use
        let incoming = &g[10].data_dep_parents;
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].extremity, 1);
        assert_eq!(incoming[0].begin, Some(3));
    }

    #[test]
    fn block_scoped_binding_is_gone_after_the_block() {
        // { let z = 1; } f(z);
        let (g, unknown) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "BlockStatement", "body": [
                    {"type": "VariableDeclaration", "declarations": [
                        {"type": "VariableDeclarator",
                         "id": {"type": "Identifier", "name": "z"},
                         "init": {"type": "Literal", "value": 1, "raw": "1"}}
                    ], "kind": "let"}
                ]},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "f"},
                    "arguments": [{"type": "Identifier", "name": "z"}]}}
            ],
            "sourceType": "script"
        }));
        assert_eq!(data_edge_count(&g), 0);
        // the z at the call site (node 9) found no definition
        assert!(unknown.contains(&9));
    }

    #[test]
    fn hoisted_function_resolves_earlier_call() {
        // foo(); function foo() {}
        let (g, unknown) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "foo"},
                    "arguments": []}},
                {"type": "FunctionDeclaration",
                 "id": {"type": "Identifier", "name": "foo"},
                 "params": [],
                 "body": {"type": "BlockStatement", "body": []},
                 "generator": false, "expression": false, "async": false}
            ],
            "sourceType": "script"
        }));
        assert!(unknown.is_empty());
        // 4 = the declaration, 1 = the earlier call statement
        let dep = &g[4].data_dep_children[0];
        assert_eq!(dep.extremity, 1);
        assert_eq!(dep.begin, Some(5));
        assert_eq!(dep.end, Some(3));
    }

    #[test]
    fn update_expression_reads_and_writes() {
        // var i = 0; i++;
        let (g, _) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "i"},
                     "init": {"type": "Literal", "value": 0, "raw": "0"}}
                ], "kind": "var"},
                {"type": "ExpressionStatement", "expression": {
                    "type": "UpdateExpression", "operator": "++", "prefix": false,
                    "argument": {"type": "Identifier", "name": "i"}}}
            ],
            "sourceType": "script"
        }));
        // one edge from the declaration, one from the update onto itself
        assert_eq!(data_edge_count(&g), 2);
        assert_eq!(g[1].data_dep_children[0].extremity, 5);
        assert_eq!(g[5].data_dep_children[0].extremity, 5);
    }

    #[test]
    fn method_call_mutates_a_known_object_only() {
        // var a = []; a.push(1); console.log(a);
        let (g, _) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "VariableDeclaration", "declarations": [
                    {"type": "VariableDeclarator",
                     "id": {"type": "Identifier", "name": "a"},
                     "init": {"type": "ArrayExpression", "elements": []}}
                ], "kind": "var"},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "MemberExpression", "computed": false,
                        "object": {"type": "Identifier", "name": "a"},
                        "property": {"type": "Identifier", "name": "push"}},
                    "arguments": [{"type": "Literal", "value": 1, "raw": "1"}]}},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "MemberExpression", "computed": false,
                        "object": {"type": "Identifier", "name": "console"},
                        "property": {"type": "Identifier", "name": "log"}},
                    "arguments": [{"type": "Identifier", "name": "a"}]}}
            ],
            "sourceType": "script"
        }));
        // a.push rewrites a, so the later read links to the push statement,
        // while console itself contributes no edge
        // 1 = declaration, 5 = a.push(1), 11 = console.log(a)
        assert_eq!(g[1].data_dep_children.len(), 1);
        assert_eq!(g[1].data_dep_children[0].extremity, 5);
        let read = g[11]
            .data_dep_parents
            .iter()
            .map(|d| d.extremity)
            .collect::<Vec<_>>();
        assert_eq!(read, [5]);
    }

    #[test]
    fn catch_parameter_is_a_declaration() {
        // try { } catch (e) { use(e); }
        let (g, unknown) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "TryStatement",
                 "block": {"type": "BlockStatement", "body": []},
                 "handler": {"type": "CatchClause",
                     "param": {"type": "Identifier", "name": "e"},
                     "body": {"type": "BlockStatement", "body": [
                         {"type": "ExpressionStatement", "expression": {
                             "type": "CallExpression",
                             "callee": {"type": "Identifier", "name": "use"},
                             "arguments": [{"type": "Identifier", "name": "e"}]}}
                     ]}},
                 "finalizer": null}
            ],
            "sourceType": "script"
        }));
        // the catch binder declares e; the inner use links back to it
        assert!(!unknown.iter().any(|&u| g[u].identifier_name() == Some("e")));
        let catch = g.nodes().find(|n| n.name == "CatchClause").unwrap().id;
        assert!(
            g[catch].data_dep_children.iter().all(|d| d.begin.is_some()),
            "catch edges carry identifier endpoints"
        );
    }

    #[test]
    fn zero_deadline_times_out_cleanly() {
        let mut g = ast_to_pdg(&json!({
            "type": "Program",
            "body": [
                {"type": "ExpressionStatement",
                 "expression": {"type": "Identifier", "name": "x"}}
            ],
            "sourceType": "script"
        }))
        .unwrap();
        build_cfg(&mut g);
        let err = add_data_flow(&mut g, Path::new("slow.js"), Some(Duration::ZERO)).unwrap_err();
        assert!(matches!(err, ArgusError::Timeout(p) if p.ends_with("slow.js")));
    }

    #[test]
    fn every_data_edge_is_mirrored() {
        let (g, _) = pdg(json!({
            "type": "Program",
            "body": [
                {"type": "IfStatement",
                 "test": {"type": "Identifier", "name": "c"},
                 "consequent": {"type": "BlockStatement", "body": [
                     {"type": "ExpressionStatement", "expression": {
                         "type": "AssignmentExpression", "operator": "=",
                         "left": {"type": "Identifier", "name": "y"},
                         "right": {"type": "Literal", "value": 1, "raw": "1"}}}
                 ]},
                 "alternate": {"type": "BlockStatement", "body": [
                     {"type": "ExpressionStatement", "expression": {
                         "type": "AssignmentExpression", "operator": "=",
                         "left": {"type": "Identifier", "name": "y"},
                         "right": {"type": "Literal", "value": 2, "raw": "2"}}}
                 ]}},
                {"type": "ExpressionStatement", "expression": {
                    "type": "CallExpression",
                    "callee": {"type": "Identifier", "name": "use"},
                    "arguments": [{"type": "Identifier", "name": "y"}]}}
            ],
            "sourceType": "script"
        }));
        for n in g.nodes() {
            for dep in &n.data_dep_children {
                assert!(
                    g[dep.extremity]
                        .data_dep_parents
                        .iter()
                        .any(|back| back.extremity == n.id
                            && back.begin == dep.begin
                            && back.end == dep.end),
                    "edge {} -> {} not mirrored",
                    n.id,
                    dep.extremity
                );
            }
            for dep in &n.control_dep_children {
                assert!(
                    g[dep.extremity]
                        .control_dep_parents
                        .iter()
                        .any(|back| back.extremity == n.id && back.label == dep.label)
                );
            }
        }
    }
}
