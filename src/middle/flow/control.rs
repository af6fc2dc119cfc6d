use std::collections::BTreeSet;

use hashbrown::HashMap;

use super::{
    BodyFlowAnalyzer, LifetimeError,
    frame::FlowFrame,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    macros::ice,
    middle::{
        hir::{
            ExpressionKind, ItemLocalId, Owner,
            visit::{Visitor, walk_expression},
        },
        path::IdentifierPath,
    },
};

type Rebindings = HashMap<IdentifierPath, LifetimeBounds>;

impl BodyFlowAnalyzer<'_, '_> {
    pub(super) fn analyze_block(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        statements: &[ItemLocalId],
    ) -> Result<(), LifetimeError> {
        let rebindings = {
            let mut scope = frame.child();

            for statement in statements {
                self.analyze_expression(&mut scope, *statement)?;
            }

            scope.into_rebindings()
        };

        for (path, bounds) in rebindings {
            frame.rebind(path, bounds);
        }

        let (bundle, escaping) = match statements.last() {
            Some(last) if !self.type_of(id).is_void() => {
                (self.bundle(*last).clone(), self.escaping_of(*last).clone())
            }
            _ => (LifetimeBundle::new(), BTreeSet::new()),
        };

        self.record(id, bundle, escaping);
        Ok(())
    }

    fn analyze_branch(&mut self, frame: &FlowFrame<'_>, id: ItemLocalId) -> Result<Rebindings, LifetimeError> {
        let mut branch = frame.child();
        self.analyze_expression(&mut branch, id)?;
        Ok(branch.into_rebindings())
    }

    pub(super) fn analyze_if(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        condition: ItemLocalId,
        positive: ItemLocalId,
        negative: Option<ItemLocalId>,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, condition)?;

        let positive_rebindings = self.analyze_branch(frame, positive)?;
        let negative_rebindings = match negative {
            Some(negative) => self.analyze_branch(frame, negative)?,
            None => Rebindings::new(),
        };

        self.merge_branches(frame, &positive_rebindings, &negative_rebindings);

        let types = self.types();
        let ty = self.type_of(id);

        let Some(negative) = negative.filter(|_| !ty.is_void()) else {
            self.record(id, LifetimeBundle::new(), BTreeSet::new());
            return Ok(());
        };

        let temp = self.temp_path("if", id);
        let mut bundle = LifetimeBundle::new();

        for (member, member_ty) in types.members(ty) {
            if types.is_value_type(&member_ty) {
                bundle.insert(member, LifetimeBounds::none());
                continue;
            }

            let joined = Lifetime::new(temp.append_path(&member), LifetimeRole::Temp, LifetimeOrigin::TempValue);

            for branch in [positive, negative] {
                if let Some(bounds) = self.bundle(branch).get(&member).cloned() {
                    self.context.graph.add_stored(&bounds.value, &joined, Some(&member_ty));
                }
            }

            bundle.insert(member, LifetimeBounds::value(joined));
        }

        let escaping = if types.is_value_type(ty) {
            BTreeSet::new()
        } else {
            self.escaping_of(positive)
                .union(self.escaping_of(negative))
                .cloned()
                .collect()
        };

        self.record(id, bundle, escaping);
        Ok(())
    }

    /// Gives every variable rebound by either branch a version that both
    /// incoming versions have to outlive
    fn merge_branches(&mut self, frame: &mut FlowFrame<'_>, positive: &Rebindings, negative: &Rebindings) {
        let paths = positive
            .keys()
            .chain(negative.keys())
            .collect::<BTreeSet<_>>();

        for path in paths {
            let before = frame.get(path).clone();
            let version = self.context.fresh_version();
            let merged = Lifetime::new(path.clone(), LifetimeRole::Alias, LifetimeOrigin::LocalValue)
                .with_version(version);

            for incoming in [positive.get(path), negative.get(path)] {
                let incoming = incoming.unwrap_or(&before);
                self.context.graph.add_stored(&incoming.value, &merged, None);
            }

            self.context.graph.add_stored(&merged, &before.location, None);

            tracing::debug!(variable = %path, version, "merged branch versions");

            frame.rebind(path.clone(), LifetimeBounds::new(merged.clone(), before.location));
            self.context.rebind_log.push((path.clone(), merged));
        }
    }

    /// Loops are analyzed once. Every variable the loop may rebind gets an
    /// entry version before the body, and every version created inside the
    /// body flows back into it, standing in for all iterations at once.
    pub(super) fn analyze_while(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        condition: ItemLocalId,
        body: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        let effects = LoopEffects::collect(self.owner, &[condition, body]);

        for path in effects.address_taken {
            self.context.expose(path);
        }

        let mut candidates = frame
            .visible_bindings()
            .into_iter()
            .filter(|(path, bounds)| {
                !bounds.value.is_none()
                    && (self.context.is_exposed(path)
                        || effects.assigned.iter().any(|assigned| path.starts_with(assigned)))
            })
            .collect::<Vec<_>>();

        candidates.sort_by(|(a, _), (b, _)| a.cmp(b));

        let mut entries = HashMap::new();

        for (path, bounds) in candidates {
            let version = self.context.fresh_version();
            let entry = Lifetime::new(path.clone(), LifetimeRole::Alias, LifetimeOrigin::LocalValue)
                .with_version(version);

            self.context.graph.add_stored(&bounds.value, &entry, None);
            self.context.graph.add_stored(&entry, &bounds.location, None);

            frame.rebind(path.clone(), LifetimeBounds::new(entry.clone(), bounds.location));
            self.context.rebind_log.push((path.clone(), entry.clone()));
            entries.insert(path, entry);
        }

        let log_start = self.context.rebind_log.len();
        let stores_start = self.context.heap_stores.len();

        {
            let mut iteration = frame.loop_body();

            self.analyze_expression(&mut iteration, condition)?;
            self.analyze_expression(&mut iteration, body)?;
        }

        for (path, version) in &self.context.rebind_log[log_start..] {
            if let Some(entry) = entries.get(path) {
                self.context.graph.add_stored(version, entry, None);
            }
        }

        // Later iterations may have made a stored value stack backed
        for (container, stored, span) in self.context.heap_stores[stores_start..].to_vec() {
            self.verify_heap_store(&container, &stored, span)?;
        }

        tracing::debug!(entries = entries.len(), "analyzed loop");

        self.record(id, LifetimeBundle::new(), BTreeSet::new());
        Ok(())
    }

    /// `break` and `continue` carry no lifetimes of their own
    pub(super) fn analyze_loop_exit(&mut self, frame: &mut FlowFrame<'_>, id: ItemLocalId) {
        if !frame.is_in_loop() {
            ice!(
                "{:?} outside of a loop reached flow analysis",
                self.owner.node(id).kind
            );
        }

        self.record(id, LifetimeBundle::new(), BTreeSet::new());
    }
}

/// The local variable (or member of one) that a place names directly,
/// without going through a pointer
pub(super) fn place_variable(owner: &Owner, id: ItemLocalId) -> Option<IdentifierPath> {
    match &owner.node(id).kind {
        ExpressionKind::Variable(path) => Some(path.clone()),
        ExpressionKind::MemberAccess { target, member } => {
            place_variable(owner, *target).map(|path| path.append(*member))
        }
        _ => None,
    }
}

/// Syntactic summary of what a loop may do to the variables around it
#[derive(Debug, Default)]
struct LoopEffects {
    assigned: BTreeSet<IdentifierPath>,
    address_taken: BTreeSet<IdentifierPath>,
}

impl LoopEffects {
    fn collect(owner: &Owner, roots: &[ItemLocalId]) -> Self {
        let mut effects = Self::default();

        for root in roots {
            effects.visit_expression(owner, *root);
        }

        effects
    }
}

impl Visitor for LoopEffects {
    fn visit_expression(&mut self, owner: &Owner, id: ItemLocalId) {
        match &owner.node(id).kind {
            ExpressionKind::Assignment { target, .. } => {
                self.assigned.extend(place_variable(owner, *target));
            }
            ExpressionKind::AddressOf(target) => {
                self.address_taken.extend(place_variable(owner, *target));
            }
            _ => {}
        }

        walk_expression(self, owner, id)
    }
}
