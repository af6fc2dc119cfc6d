use std::collections::BTreeSet;

use super::{
    BodyFlowAnalyzer, LifetimeError,
    frame::FlowFrame,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    frontend::intern::InternedSymbol,
    macros::ice,
    middle::{hir::ItemLocalId, path::IdentifierPath},
};

impl BodyFlowAnalyzer<'_, '_> {
    /// `Type { a: ..., b: ... }`
    pub(super) fn analyze_struct_literal(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        fields: &[(InternedSymbol, ItemLocalId)],
    ) -> Result<(), LifetimeError> {
        for (_, field) in fields {
            self.analyze_expression(frame, *field)?;
        }

        let types = self.types();
        let ty = self.type_of(id);

        if types.is_value_type(ty) {
            let bundle = self.untracked_bundle(ty);
            self.record(id, bundle, BTreeSet::new());
            return Ok(());
        }

        let whole = Lifetime::new(self.temp_path("struct", id), LifetimeRole::Temp, LifetimeOrigin::TempValue);
        let mut bundle = LifetimeBundle::new();
        let mut escaping = BTreeSet::new();

        for (name, field) in fields {
            let prefix = IdentifierPath::from(*name);
            let field_ty = self.type_of(*field);

            for (member, bounds) in self.bundle(*field).clone().iter() {
                if !bounds.value.is_none() {
                    self.context.graph.add_stored(&bounds.value, &whole, Some(field_ty));
                }

                bundle.insert(prefix.append_path(member), LifetimeBounds::value(bounds.value.clone()));
            }

            escaping.extend(self.escaping_of(*field).iter().cloned());
        }

        // Union members that were not initialized share the storage of the
        // one that was, so they live exactly as long as the whole value
        for (member, member_ty) in types.members(ty) {
            if bundle.get(&member).is_some() {
                continue;
            }

            let bounds = if member.is_empty() {
                LifetimeBounds::value(whole.clone())
            } else if types.is_value_type(&member_ty) {
                LifetimeBounds::none()
            } else {
                LifetimeBounds::value(whole.clone())
            };

            bundle.insert(member, bounds);
        }

        self.record(id, bundle, escaping);
        Ok(())
    }

    /// `target.member` read as a value
    pub(super) fn analyze_member_access(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        member: InternedSymbol,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, target)?;

        let escaping = if self.types().is_value_type(self.type_of(id)) {
            BTreeSet::new()
        } else {
            self.escaping_of(target).clone()
        };

        let bundle = self.member_bundle(id, target, member);
        self.record(id, bundle, escaping);
        Ok(())
    }

    /// `target.member` as an assignment target
    pub(super) fn analyze_member_place(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        member: InternedSymbol,
    ) -> Result<(), LifetimeError> {
        self.analyze_place(frame, target)?;

        let escaping = self.escaping_of(target).clone();
        let bundle = self.member_bundle(id, target, member);
        self.record(id, bundle, escaping);
        Ok(())
    }

    fn member_bundle(&self, id: ItemLocalId, target: ItemLocalId, member: InternedSymbol) -> LifetimeBundle {
        let bundle = self.bundle(target).scoped_to(&IdentifierPath::from(member));

        if bundle.whole().is_none() {
            ice!("member `{member}` of node {target:?} has no lifetimes");
        }

        debug_assert_eq!(
            bundle.len(),
            self.types().members(self.type_of(id)).len(),
            "member bundle does not match the member's type"
        );

        bundle
    }
}
