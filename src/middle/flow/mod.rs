//! Helix Flow Analysis
//!
//! Infers, for every expression in a type checked module, which storage
//! regions back its data and its storage slot, and proves that no reference
//! outlives the region backing it. There are no lifetime annotations in the
//! language so everything here is inferred:
//!
//!   1) every parameter, stack slot and heap allocation is a *root* lifetime
//!   2) expressions are visited bottom-up, each producing a [`LifetimeBundle`]
//!      (one pair of value and location lifetimes per member path of its type)
//!      and adding "must outlive" edges to the [`LifetimeGraph`]
//!   3) whenever a value leaves its function (or is written to the heap) its
//!      transitive precursors may not contain any non-heap root
//!
//! The graph, the root set and the variable dependency graph are shared by
//! every function in the module. Scoping is modelled by [`FlowFrame`]s which
//! only hold local bindings. Assignments never mutate an existing lifetime.
//! Instead they bind the written slot to a fresh *version*, and control flow
//! joins merge versions the same way an SSA construction would.

use std::collections::{BTreeMap, BTreeSet};

use hashbrown::HashSet;

pub use self::{
    error::LifetimeError,
    escape::VariableGraph,
    frame::FlowFrame,
    graph::LifetimeGraph,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    frontend::Span,
    index::{Index, IndexVec},
    macros::ice,
    middle::{
        hir::{
            ExpressionKind, HirId, ItemLocalId, LocalDefId, Module, Owner,
            visit::{Visitor, walk_expression, walk_module},
        },
        path::IdentifierPath,
        ty::{Type, TypeContext},
    },
};

mod aggregates;
mod control;
mod error;
mod escape;
mod frame;
mod functions;
mod graph;
mod lifetime;
mod memory;
mod variables;

/// Knobs for the analysis. The defaults are what the compiler runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOptions {
    /// Resolve `*p` to the local `p` provably points at instead of
    /// synthesizing a fresh lifetime
    pub alias_shortcut: bool,
    /// Reject writes of stack backed data into heap memory
    pub check_heap_stores: bool,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            alias_shortcut: true,
            check_heap_stores: true,
        }
    }
}

/// Analyzes every function in `module`, stopping at the first lifetime
/// violation
#[tracing::instrument(level = "debug", skip_all)]
pub fn analyze_module(
    module: &Module,
    types: &TypeContext,
    options: &FlowOptions,
) -> Result<ModuleFlowResults, LifetimeError> {
    let mut context = FlowContext::new(types, options);
    let mut owners = BTreeMap::new();

    for owner in module.owners.iter() {
        // Struct and union declarations have no flow of their own
        let Some(function) = owner.function() else {
            continue;
        };

        let results = BodyFlowAnalyzer::new(&mut context, owner, function.path.clone())
            .analyze_function(function)?;

        owners.insert(owner.def_id, results);
    }

    tracing::debug!(
        edges = context.graph.edge_count(),
        roots = context.roots.len(),
        "flow analysis finished"
    );

    let results = ModuleFlowResults {
        owners,
        graph: context.graph,
        roots: context.roots,
        variables: context.variables,
    };

    if cfg!(debug_assertions) {
        let incomplete = results.incomplete_nodes(module, types);

        if !incomplete.is_empty() {
            ice!("flow analysis left nodes without lifetimes: {incomplete:?}");
        }
    }

    Ok(results)
}

/// Module wide state shared by every frame and every function
#[derive(Debug)]
struct FlowContext<'a> {
    types: &'a TypeContext,
    options: &'a FlowOptions,
    graph: LifetimeGraph,
    roots: HashSet<Lifetime>,
    variables: VariableGraph,
    /// Locals (or members of locals) whose address has been taken. Writes
    /// through an alias may change them behind our back.
    exposed: HashSet<IdentifierPath>,
    /// Every (variable, version) binding created so far, in order
    rebind_log: Vec<(IdentifierPath, Lifetime)>,
    /// Every `(container, stored)` write into possibly heap backed storage.
    /// Loops replay theirs once the back edges are in place.
    heap_stores: Vec<(Lifetime, Lifetime, Span)>,
    next_version: u32,
}

impl<'a> FlowContext<'a> {
    fn new(types: &'a TypeContext, options: &'a FlowOptions) -> Self {
        Self {
            types,
            options,
            graph: LifetimeGraph::new(),
            roots: HashSet::from([Lifetime::heap()]),
            variables: VariableGraph::new(),
            exposed: HashSet::new(),
            rebind_log: Vec::new(),
            heap_stores: Vec::new(),
            next_version: 1,
        }
    }

    fn fresh_version(&mut self) -> u32 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }

    fn add_root(&mut self, lifetime: Lifetime) {
        if !lifetime.is_root() {
            ice!("only root lifetimes may join the root set, got {lifetime}");
        }

        self.roots.insert(lifetime);
    }

    fn expose(&mut self, path: IdentifierPath) {
        self.exposed.insert(path);
    }

    /// Whether `path` (or anything containing it) has had its address taken
    fn is_exposed(&self, path: &IdentifierPath) -> bool {
        path.prefixes().any(|prefix| self.exposed.contains(&prefix))
    }
}

/// Flow analysis of a single owner's expression arena
struct BodyFlowAnalyzer<'ctx, 'a> {
    context: &'ctx mut FlowContext<'a>,
    owner: &'a Owner,
    /// Path of the owner, used to name temporaries
    scope: IdentifierPath,
    lifetimes: IndexVec<ItemLocalId, Option<LifetimeBundle>>,
    escaping: IndexVec<ItemLocalId, Option<BTreeSet<IdentifierPath>>>,
}

impl<'ctx, 'a> BodyFlowAnalyzer<'ctx, 'a> {
    fn new(context: &'ctx mut FlowContext<'a>, owner: &'a Owner, scope: IdentifierPath) -> Self {
        let len = owner.nodes.len();

        Self {
            context,
            owner,
            scope,
            lifetimes: IndexVec::from_elem_n(None, len),
            escaping: IndexVec::from_elem_n(None, len),
        }
    }

    fn types(&self) -> &'a TypeContext {
        self.context.types
    }

    fn options(&self) -> &'a FlowOptions {
        self.context.options
    }

    fn type_of(&self, id: ItemLocalId) -> &'a Type {
        &self.owner.node(id).ty
    }

    fn is_analyzed(&self, id: ItemLocalId) -> bool {
        self.lifetimes[id].is_some()
    }

    fn record(&mut self, id: ItemLocalId, bundle: LifetimeBundle, escaping: BTreeSet<IdentifierPath>) {
        if self.lifetimes[id].is_some() {
            ice!("lifetimes of node {id:?} were recorded twice");
        }

        self.lifetimes[id] = Some(bundle);
        self.escaping[id] = Some(escaping);
    }

    fn bundle(&self, id: ItemLocalId) -> &LifetimeBundle {
        match &self.lifetimes[id] {
            Some(bundle) => bundle,
            None => ice!("lifetimes of node {id:?} were used before its flow was analyzed"),
        }
    }

    fn escaping_of(&self, id: ItemLocalId) -> &BTreeSet<IdentifierPath> {
        match &self.escaping[id] {
            Some(escaping) => escaping,
            None => ice!("escaping variables of node {id:?} were used before its flow was analyzed"),
        }
    }

    /// The whole-value bounds of an expression of non-void type
    fn whole(&self, id: ItemLocalId) -> LifetimeBounds {
        match self.bundle(id).whole() {
            Some(bounds) => bounds.clone(),
            None => ice!("node {id:?} of type {} has no whole-value lifetimes", self.type_of(id)),
        }
    }

    /// A bundle of `(None, None)` for every member of `ty`
    fn untracked_bundle(&self, ty: &Type) -> LifetimeBundle {
        self.types()
            .members(ty)
            .into_iter()
            .map(|(member, _)| (member, LifetimeBounds::none()))
            .collect()
    }

    /// Names the temporary introduced by node `id`, e.g. `main::$deref_12`
    fn temp_path(&self, kind: &str, id: ItemLocalId) -> IdentifierPath {
        self.scope
            .append(format!("${kind}_{}", id.index()).as_str())
    }

    /// Analyzes `id` in value (rvalue) position
    fn analyze_expression(&mut self, frame: &mut FlowFrame<'_>, id: ItemLocalId) -> Result<(), LifetimeError> {
        if self.is_analyzed(id) {
            return Ok(());
        }

        match &self.owner.node(id).kind {
            ExpressionKind::Literal(_) => {
                self.analyze_operator(frame, id, &[])
            }
            ExpressionKind::Variable(path) => {
                self.analyze_variable(frame, id, path);
                Ok(())
            }
            ExpressionKind::AddressOf(target) => self.analyze_address_of(frame, id, *target),
            ExpressionKind::Dereference(target) => self.analyze_dereference(frame, id, *target),
            ExpressionKind::MemberAccess { target, member } => {
                self.analyze_member_access(frame, id, *target, *member)
            }
            ExpressionKind::Index { target, index } => self.analyze_index(frame, id, *target, *index),
            ExpressionKind::New { initializer } => self.analyze_new(frame, id, *initializer),
            ExpressionKind::StructLiteral { fields } => self.analyze_struct_literal(frame, id, fields),
            ExpressionKind::Unary { operand, .. } => self.analyze_operator(frame, id, &[*operand]),
            ExpressionKind::Binary { lhs, rhs, .. } => self.analyze_operator(frame, id, &[*lhs, *rhs]),
            ExpressionKind::Call {
                function,
                arguments,
            } => self.analyze_call(frame, id, function, arguments),
            ExpressionKind::Block(statements) => self.analyze_block(frame, id, statements),
            ExpressionKind::VariableDeclaration { path, value } => {
                self.analyze_declaration(frame, id, path, *value)
            }
            ExpressionKind::Assignment { target, value } => {
                self.analyze_assignment(frame, id, *target, *value)
            }
            ExpressionKind::If {
                condition,
                positive,
                negative,
            } => self.analyze_if(frame, id, *condition, *positive, *negative),
            ExpressionKind::While { condition, body } => self.analyze_while(frame, id, *condition, *body),
            ExpressionKind::Break | ExpressionKind::Continue => {
                self.analyze_loop_exit(frame, id);
                Ok(())
            }
        }
    }

    /// Analyzes `id` in place (lvalue) position: as the target of an
    /// assignment or the operand of `&`
    fn analyze_place(&mut self, frame: &mut FlowFrame<'_>, id: ItemLocalId) -> Result<(), LifetimeError> {
        if self.is_analyzed(id) {
            return Ok(());
        }

        match &self.owner.node(id).kind {
            ExpressionKind::Variable(path) => {
                self.analyze_variable_place(frame, id, path);
                Ok(())
            }
            ExpressionKind::Dereference(target) => self.analyze_dereference_place(frame, id, *target),
            ExpressionKind::MemberAccess { target, member } => {
                self.analyze_member_place(frame, id, *target, *member)
            }
            ExpressionKind::Index { target, index } => {
                self.analyze_index_place(frame, id, *target, *index)
            }
            kind => ice!("{kind:?} cannot be used as a place"),
        }
    }

    fn finish(self) -> OwnerFlowResults {
        OwnerFlowResults {
            lifetimes: self.lifetimes,
            escaping: self.escaping,
        }
    }
}

/// Per-node results for one owner
#[derive(Debug)]
pub struct OwnerFlowResults {
    lifetimes: IndexVec<ItemLocalId, Option<LifetimeBundle>>,
    escaping: IndexVec<ItemLocalId, Option<BTreeSet<IdentifierPath>>>,
}

/// Everything code generation needs to know about the regions of a module
#[derive(Debug)]
pub struct ModuleFlowResults {
    owners: BTreeMap<LocalDefId, OwnerFlowResults>,
    graph: LifetimeGraph,
    roots: HashSet<Lifetime>,
    variables: VariableGraph,
}

impl ModuleFlowResults {
    pub fn try_lifetimes(&self, hir_id: HirId) -> Option<&LifetimeBundle> {
        self.owners
            .get(&hir_id.owner)
            .and_then(|owner| owner.lifetimes.get(hir_id.local_id))
            .and_then(Option::as_ref)
    }

    /// The recorded bundle of a node. Asking for a node that flow analysis
    /// never visited is a compiler bug.
    pub fn lifetimes(&self, hir_id: HirId) -> &LifetimeBundle {
        match self.try_lifetimes(hir_id) {
            Some(bundle) => bundle,
            None => ice!("requested the lifetimes of node {hir_id} before flow analysis visited it"),
        }
    }

    pub fn escaping_variables(&self, hir_id: HirId) -> &BTreeSet<IdentifierPath> {
        let escaping = self
            .owners
            .get(&hir_id.owner)
            .and_then(|owner| owner.escaping.get(hir_id.local_id))
            .and_then(Option::as_ref);

        match escaping {
            Some(escaping) => escaping,
            None => ice!("requested the escaping variables of node {hir_id} before flow analysis visited it"),
        }
    }

    pub fn graph(&self) -> &LifetimeGraph {
        &self.graph
    }

    pub fn roots(&self) -> &HashSet<Lifetime> {
        &self.roots
    }

    pub fn is_root(&self, lifetime: &Lifetime) -> bool {
        self.roots.contains(lifetime)
    }

    pub fn variables(&self) -> &VariableGraph {
        &self.variables
    }

    /// Nodes reachable from a function body that are missing a bundle, or
    /// whose bundle does not cover exactly the member paths of their type
    pub fn incomplete_nodes(&self, module: &Module, types: &TypeContext) -> Vec<HirId> {
        let mut coverage = BundleCoverage {
            results: self,
            types,
            incomplete: Vec::new(),
        };

        walk_module(&mut coverage, module);
        coverage.incomplete
    }
}

struct BundleCoverage<'r> {
    results: &'r ModuleFlowResults,
    types: &'r TypeContext,
    incomplete: Vec<HirId>,
}

impl Visitor for BundleCoverage<'_> {
    fn visit_expression(&mut self, owner: &Owner, id: ItemLocalId) {
        let node = owner.node(id);

        let complete = self.results.try_lifetimes(node.hir_id).is_some_and(|bundle| {
            let expected = self
                .types
                .members(&node.ty)
                .into_iter()
                .map(|(member, _)| member)
                .collect::<BTreeSet<_>>();

            bundle.members().cloned().collect::<BTreeSet<_>>() == expected
        });

        if !complete {
            self.incomplete.push(node.hir_id);
        }

        walk_expression(self, owner, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn only_roots_join_the_root_set() {
        let types = TypeContext::new();
        let options = FlowOptions::default();
        let mut context = FlowContext::new(&types, &options);

        context.add_root(Lifetime::new(
            IdentifierPath::from("main::p"),
            LifetimeRole::Alias,
            LifetimeOrigin::LocalValue,
        ));
    }

    #[test]
    fn the_heap_is_always_a_root() {
        let types = TypeContext::new();
        let options = FlowOptions::default();
        let context = FlowContext::new(&types, &options);

        assert!(context.roots.contains(&Lifetime::heap()));
        assert!(context.heap_stores.is_empty());
    }
}
