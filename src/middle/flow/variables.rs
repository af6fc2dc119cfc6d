use std::collections::BTreeSet;

use super::{
    BodyFlowAnalyzer, LifetimeError,
    control::place_variable,
    frame::FlowFrame,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    macros::ice,
    middle::{
        hir::ItemLocalId,
        path::IdentifierPath,
        ty::Type,
    },
};

impl BodyFlowAnalyzer<'_, '_> {
    /// Declares the storage slot of every member of a new binding and
    /// registers it as a root
    pub(super) fn declare_location(&mut self, path: &IdentifierPath) -> Lifetime {
        let location = Lifetime::new(path.clone(), LifetimeRole::Root, LifetimeOrigin::LocalLocation);
        self.context.add_root(location.clone());
        location
    }

    /// `var x = value`
    pub(super) fn analyze_declaration(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        path: &IdentifierPath,
        value: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, value)?;

        let types = self.types();
        let initializer = self.bundle(value).clone();

        for (member, member_ty) in types.members(self.type_of(value)) {
            let member_path = path.append_path(&member);
            let location = self.declare_location(&member_path);

            if types.is_value_type(&member_ty) {
                frame.declare(member_path, LifetimeBounds::new(Lifetime::none(), location));
                continue;
            }

            let Some(initial) = initializer.get(&member) else {
                ice!("initializer of `{path}` has no lifetimes for member `{member}`");
            };

            let value = Lifetime::new(member_path.clone(), LifetimeRole::Alias, LifetimeOrigin::LocalValue);

            self.context.graph.add_alias(&value, &initial.value);
            self.context.graph.add_stored(&value, &location, Some(&member_ty));

            frame.declare(member_path, LifetimeBounds::new(value, location));
        }

        for escapee in self.escaping_of(value).clone() {
            self.context.variables.add_dependency(&escapee, path);
        }

        self.record(id, LifetimeBundle::new(), BTreeSet::new());
        Ok(())
    }

    /// Reads a variable. Members that are plain values carry no lifetimes.
    pub(super) fn analyze_variable(&mut self, frame: &mut FlowFrame<'_>, id: ItemLocalId, path: &IdentifierPath) {
        let types = self.types();
        let ty = self.type_of(id);

        let bundle = types
            .members(ty)
            .into_iter()
            .map(|(member, member_ty)| {
                let bounds = if types.is_value_type(&member_ty) {
                    LifetimeBounds::none()
                } else {
                    frame.get(&path.append_path(&member)).clone()
                };

                (member, bounds)
            })
            .collect();

        let escaping = if types.is_value_type(ty) {
            BTreeSet::new()
        } else {
            BTreeSet::from([path.clone()])
        };

        self.record(id, bundle, escaping);
    }

    /// Names a variable's storage as an assignment target or `&` operand
    pub(super) fn analyze_variable_place(&mut self, frame: &mut FlowFrame<'_>, id: ItemLocalId, path: &IdentifierPath) {
        let bundle = self
            .types()
            .members(self.type_of(id))
            .into_iter()
            .map(|(member, _)| {
                let bounds = frame.get(&path.append_path(&member)).clone();
                (member, bounds)
            })
            .collect();

        self.record(id, bundle, BTreeSet::from([path.clone()]));
    }

    /// `&place`: a pointer whose data lives exactly as long as the place's
    /// storage slot
    pub(super) fn analyze_address_of(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_place(frame, target)?;

        let place = self.whole(target);

        if place.location.is_none() {
            ice!("place {target:?} has no storage location to take the address of");
        }

        if place.location.origin() == LifetimeOrigin::LocalLocation {
            self.context.expose(place.location.path().clone());
        }

        let escaping = self.escaping_of(target).clone();
        let bundle = LifetimeBundle::from_iter([(IdentifierPath::new(), LifetimeBounds::value(place.location))]);

        self.record(id, bundle, escaping);
        Ok(())
    }

    /// `place = value`
    pub(super) fn analyze_assignment(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        value: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_place(frame, target)?;
        self.analyze_expression(frame, value)?;

        let types = self.types();
        let places = self.bundle(target).clone();
        let assigned = self.bundle(value).clone();
        let span = self.owner.node(value).span;

        for (member, member_ty) in types.members(self.type_of(target)) {
            let (Some(place), Some(new)) = (places.get(&member), assigned.get(&member)) else {
                ice!("assignment {id:?} is missing lifetimes for member `{member}`");
            };

            if place.location.origin() == LifetimeOrigin::LocalLocation {
                // Value members of a local need no new version
                if types.is_value_type(&member_ty) {
                    continue;
                }

                self.rebind_local(frame, &place.location, &new.value, &member_ty);
                continue;
            }

            if new.value.is_none() {
                continue;
            }

            self.check_heap_store(&place.location, &new.value, span)?;
            self.context.graph.add_stored(&new.value, &place.value, Some(&member_ty));
        }

        if let Some(variable) = place_variable(self.owner, target) {
            for escapee in self.escaping_of(value).clone() {
                self.context.variables.add_dependency(&escapee, &variable);
            }
        }

        self.record(id, LifetimeBundle::new(), BTreeSet::new());
        Ok(())
    }

    /// Binds the slot `location` to a fresh version aliasing `assigned`. The
    /// previous version is left untouched in the graph so that anything that
    /// captured it keeps its edges.
    pub(super) fn rebind_local(&mut self, frame: &mut FlowFrame<'_>, location: &Lifetime, assigned: &Lifetime, ty: &Type) {
        let path = location.path().clone();
        let version = self.context.fresh_version();
        let value = Lifetime::new(path.clone(), LifetimeRole::Alias, LifetimeOrigin::LocalValue).with_version(version);

        self.context.graph.add_alias(&value, assigned);
        self.context.graph.add_stored(&value, location, Some(ty));

        tracing::trace!(variable = %path, version, "rebound");

        frame.rebind(path.clone(), LifetimeBounds::new(value.clone(), location.clone()));
        self.context.rebind_log.push((path, value));
    }
}
