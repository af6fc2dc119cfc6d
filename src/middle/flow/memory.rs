use std::collections::BTreeSet;

use super::{
    BodyFlowAnalyzer, LifetimeError,
    frame::FlowFrame,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    frontend::Span,
    middle::{hir::ItemLocalId, path::IdentifierPath, ty::Type},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl BodyFlowAnalyzer<'_, '_> {
    /// `*pointer` read as a value
    pub(super) fn analyze_dereference(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, target)?;

        let pointer = self.whole(target);
        self.read_through(frame, id, target, &pointer, "deref");
        Ok(())
    }

    /// `*pointer` as an assignment target
    pub(super) fn analyze_dereference_place(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, target)?;

        let pointer = self.whole(target);
        self.write_through(frame, id, target, &pointer, "deref");
        Ok(())
    }

    /// `array[index]` read as a value
    pub(super) fn analyze_index(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        index: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, target)?;
        self.analyze_expression(frame, index)?;

        // Elements are never resolved to a single local, so the array value
        // is passed without its slot to keep the shortcut out of the picture
        let array = LifetimeBounds::value(self.whole(target).value);
        self.read_through(frame, id, target, &array, "index");
        Ok(())
    }

    /// `array[index]` as an assignment target
    pub(super) fn analyze_index_place(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        index: ItemLocalId,
    ) -> Result<(), LifetimeError> {
        self.analyze_expression(frame, target)?;
        self.analyze_expression(frame, index)?;

        let array = LifetimeBounds::value(self.whole(target).value);
        self.write_through(frame, id, target, &array, "index");
        Ok(())
    }

    /// Reads the data behind a pointer. Every reference found there gets a
    /// fresh root that has to outlive the pointer it was reached through.
    fn read_through(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        pointer: &LifetimeBounds,
        kind: &str,
    ) {
        let types = self.types();
        let pointee = self.type_of(id);

        let escaping = if types.is_value_type(pointee) {
            BTreeSet::new()
        } else {
            self.escaping_of(target).clone()
        };

        if let Some(bundle) = self.local_alias(frame, pointer, pointee, Access::Read) {
            self.record(id, bundle, escaping);
            return;
        }

        let temp = self.temp_path(kind, id);
        let mut bundle = LifetimeBundle::new();

        for (member, member_ty) in types.members(pointee) {
            if types.is_value_type(&member_ty) {
                bundle.insert(member, LifetimeBounds::none());
                continue;
            }

            let value = Lifetime::new(temp.append_path(&member), LifetimeRole::Root, LifetimeOrigin::TempValue);

            self.context.add_root(value.clone());
            self.context.graph.add_stored(&value, &pointer.value, Some(&member_ty));

            bundle.insert(member, LifetimeBounds::value(value));
        }

        self.record(id, bundle, escaping);
    }

    /// Names the data behind a pointer as storage. A write through the
    /// pointer may land in any region that could have produced the pointer,
    /// so the written value is tied to all of them.
    fn write_through(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        target: ItemLocalId,
        pointer: &LifetimeBounds,
        kind: &str,
    ) {
        let types = self.types();
        let pointee = self.type_of(id);
        let escaping = self.escaping_of(target).clone();

        if let Some(bundle) = self.local_alias(frame, pointer, pointee, Access::Write) {
            self.record(id, bundle, escaping);
            return;
        }

        let temp = self.temp_path(kind, id);
        let upstream = self.context.graph.precursors(&pointer.value);
        let mut bundle = LifetimeBundle::new();

        for (member, member_ty) in types.members(pointee) {
            if types.is_value_type(&member_ty) {
                bundle.insert(member, LifetimeBounds::new(Lifetime::none(), pointer.value.clone()));
                continue;
            }

            let alias = Lifetime::new(temp.append_path(&member), LifetimeRole::Alias, LifetimeOrigin::TempValue);

            for precursor in &upstream {
                self.context.graph.add_stored(&alias, precursor, None);
            }

            self.context.graph.add_stored(&alias, &pointer.value, Some(&member_ty));

            bundle.insert(member, LifetimeBounds::new(alias, pointer.value.clone()));
        }

        self.record(id, bundle, escaping);
    }

    /// Resolves a pointer that provably holds the address of exactly one
    /// local to that local's own lifetimes. This only holds when:
    ///
    ///   - the pointer was read straight out of a local slot
    ///   - that slot has never had its address taken, so its current binding
    ///     is the one written last
    ///   - the slot's current value is equivalent to exactly one local slot
    fn local_alias(
        &self,
        frame: &FlowFrame<'_>,
        pointer: &LifetimeBounds,
        pointee: &Type,
        access: Access,
    ) -> Option<LifetimeBundle> {
        if !self.options().alias_shortcut {
            return None;
        }

        let slot = &pointer.location;

        if slot.origin() != LifetimeOrigin::LocalLocation || self.context.is_exposed(slot.path()) {
            return None;
        }

        let current = &frame.lookup(slot.path())?.value;

        if current.is_none() {
            return None;
        }

        let locations = self
            .context
            .graph
            .equivalents(current)
            .into_iter()
            .filter(|lt| lt.origin() == LifetimeOrigin::LocalLocation)
            .collect::<Vec<_>>();

        let [pointee_location] = locations.as_slice() else {
            return None;
        };

        let types = self.types();
        let mut bundle = LifetimeBundle::new();

        for (member, member_ty) in types.members(pointee) {
            // The local may have gone out of scope, in which case we know
            // nothing better than the general rule
            let bounds = frame.lookup(&pointee_location.path().append_path(&member))?;

            let bounds = match access {
                Access::Read if types.is_value_type(&member_ty) => LifetimeBounds::none(),
                Access::Read | Access::Write => bounds.clone(),
            };

            bundle.insert(member, bounds);
        }

        tracing::debug!(pointer = %slot, local = %pointee_location, ?access, "resolved dereference to local");

        Some(bundle)
    }

    /// `new T` and `new T(initializer)`: every allocation is its own heap
    /// region
    pub(super) fn analyze_new(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        initializer: Option<ItemLocalId>,
    ) -> Result<(), LifetimeError> {
        let region = Lifetime::new(self.temp_path("new", id), LifetimeRole::Root, LifetimeOrigin::Heap);
        self.context.add_root(region.clone());

        if let Some(initializer) = initializer {
            self.analyze_expression(frame, initializer)?;

            let span = self.owner.node(initializer).span;
            let types = self.types();
            let initial = self.bundle(initializer).clone();

            for (member, member_ty) in types.members(self.type_of(initializer)) {
                let Some(bounds) = initial.get(&member) else {
                    continue;
                };

                if bounds.value.is_none() {
                    continue;
                }

                self.check_heap_store(&region, &bounds.value, span)?;
                self.context.graph.add_stored(&bounds.value, &region, Some(&member_ty));
            }
        }

        let bundle = LifetimeBundle::from_iter([(IdentifierPath::new(), LifetimeBounds::value(region))]);
        self.record(id, bundle, BTreeSet::new());
        Ok(())
    }

    /// Rejects storing `stored` into `container` when the container is heap
    /// memory and the stored data still depends on a stack or parameter root.
    /// The store is remembered so an enclosing loop can check it again.
    pub(super) fn check_heap_store(
        &mut self,
        container: &Lifetime,
        stored: &Lifetime,
        span: Span,
    ) -> Result<(), LifetimeError> {
        self.context
            .heap_stores
            .push((container.clone(), stored.clone(), span));

        self.verify_heap_store(container, stored, span)
    }

    pub(super) fn verify_heap_store(
        &self,
        container: &Lifetime,
        stored: &Lifetime,
        span: Span,
    ) -> Result<(), LifetimeError> {
        if !self.options().check_heap_stores {
            return Ok(());
        }

        let heap_backed = container.is_heap()
            || self
                .context
                .graph
                .equivalents(container)
                .iter()
                .any(Lifetime::is_heap);

        if !heap_backed {
            return Ok(());
        }

        let roots = self.context.graph.root_dependencies(stored);

        if roots.is_empty() {
            return Ok(());
        }

        Err(LifetimeError::HeapStore {
            span,
            roots: roots.into_iter().collect(),
        })
    }
}
