use crate::node::{NodeId, Pdg};

/// Tracks `let`/`const` declarations so they can be popped on block exit.
/// `before` snapshots the bindings as they were when the first block-scoped
/// declaration was seen; `after` lists the identifiers that must not outlive
/// the block.
#[derive(Debug, Clone, Default)]
pub struct LimitedScope {
    pub limit: bool,
    pub before: Option<Box<VarList>>,
    pub after: Vec<NodeId>,
}

/// The variable environment threaded through data-flow construction.
///
/// Three parallel sequences: the identifier node of each binding's latest
/// definition, an optional forced-target override (set when a binding's last
/// write straddles both sides of a branch), and a flag marking function
/// declarations for hoisting.
#[derive(Debug, Clone, Default)]
pub struct VarList {
    vars: Vec<NodeId>,
    refs: Vec<Option<Vec<NodeId>>>,
    funs: Vec<bool>,
    pub limited: LimitedScope,
}

impl VarList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vars(&self) -> &[NodeId] {
        &self.vars
    }

    pub fn var(&self, index: usize) -> NodeId {
        self.vars[index]
    }

    pub fn forced_targets(&self, index: usize) -> Option<&[NodeId]> {
        self.refs[index].as_deref()
    }

    pub fn add_var(&mut self, identifier: NodeId) {
        self.add_var_full(identifier, None, false);
    }

    pub fn add_var_full(&mut self, identifier: NodeId, targets: Option<Vec<NodeId>>, fun: bool) {
        self.vars.push(identifier);
        self.refs.push(targets);
        self.funs.push(fun);
    }

    /// Replace a slot with a fresh definition, clearing any forced target.
    pub fn update_var(&mut self, index: usize, identifier: NodeId) {
        self.vars[index] = identifier;
        self.refs[index] = None;
        self.funs[index] = false;
    }

    pub fn force_targets(&mut self, index: usize, targets: Vec<NodeId>) {
        self.refs[index] = Some(targets);
    }

    /// Position of an identifier's *name* in the environment.
    pub fn position(&self, g: &Pdg, identifier: NodeId) -> Option<usize> {
        let wanted = g[identifier].identifier_name()?;
        self.vars
            .iter()
            .position(|&v| g[v].identifier_name() == Some(wanted))
    }

    pub fn contains_id(&self, identifier: NodeId) -> bool {
        self.vars.contains(&identifier)
    }

    /// Copy of the bindings with a fresh limited-scope record, used on
    /// function entry and around branches.
    pub fn snapshot(&self) -> VarList {
        VarList {
            vars: self.vars.clone(),
            refs: self.refs.clone(),
            funs: self.funs.clone(),
            limited: LimitedScope::default(),
        }
    }

    pub fn is_equal(&self, other: &VarList) -> bool {
        self.vars == other.vars && self.refs == other.refs && self.funs == other.funs
    }

    /// Record the pre-block bindings; callers refill only while the record
    /// is still empty (see [`Self::before_limit_empty`]).
    pub fn fill_before_limit(&mut self) {
        self.limited.before = Some(Box::new(self.snapshot()));
    }

    pub fn before_limit_empty(&self) -> bool {
        match &self.limited.before {
            None => true,
            Some(list) => list.vars.is_empty(),
        }
    }

    pub fn in_before_limit(&self, identifier: NodeId) -> bool {
        self.limited
            .before
            .as_ref()
            .is_some_and(|l| l.vars.contains(&identifier))
    }

    pub fn in_after_limit(&self, identifier: NodeId) -> bool {
        self.limited.after.contains(&identifier)
    }

    pub fn add_limited(&mut self, identifier: NodeId) {
        self.limited.after.push(identifier);
    }

    /// Pop block-scoped bindings: restore the environment recorded when the
    /// block's first `let`/`const` was processed.
    pub fn limit_scope(&mut self) {
        if self.limited.limit {
            self.limited.limit = false;
            if let Some(before) = self.limited.before.take() {
                self.vars = before.vars;
                self.refs = before.refs;
                self.funs = before.funs;
            }
            self.limited.after.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_clears_forced_targets() {
        let mut l = VarList::new();
        l.add_var(3);
        l.force_targets(0, vec![3, 7]);
        assert_eq!(l.forced_targets(0), Some([3, 7].as_slice()));
        l.update_var(0, 9);
        assert_eq!(l.forced_targets(0), None);
        assert_eq!(l.var(0), 9);
    }

    #[test]
    fn limit_scope_restores_the_snapshot() {
        let mut l = VarList::new();
        l.add_var(1);
        l.fill_before_limit();
        l.add_var(2);
        l.limited.limit = true;
        l.add_limited(2);
        l.limit_scope();
        assert_eq!(l.vars(), [1]);
        assert!(!l.limited.limit);
        assert!(l.limited.after.is_empty());
    }

    #[test]
    fn snapshot_does_not_share_limited_state() {
        let mut l = VarList::new();
        l.add_var(1);
        l.limited.limit = true;
        let s = l.snapshot();
        assert!(!s.limited.limit);
        assert_eq!(s.vars(), [1]);
    }
}
