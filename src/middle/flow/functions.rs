use std::collections::BTreeSet;

use super::{
    BodyFlowAnalyzer, LifetimeError, OwnerFlowResults,
    frame::FlowFrame,
    lifetime::{Lifetime, LifetimeBounds, LifetimeBundle, LifetimeOrigin, LifetimeRole},
};
use crate::{
    macros::ice,
    middle::{
        hir::{Function, ItemLocalId},
        path::IdentifierPath,
    },
};

impl BodyFlowAnalyzer<'_, '_> {
    #[tracing::instrument(level = "debug", skip_all, fields(function = %function.path))]
    pub(super) fn analyze_function(mut self, function: &Function) -> Result<OwnerFlowResults, LifetimeError> {
        let mut frame = FlowFrame::root();

        self.declare_parameters(&mut frame, function);
        self.analyze_expression(&mut frame, function.body)?;

        if !function.return_type.is_void() {
            self.validate_return(function)?;
        }

        Ok(self.finish())
    }

    /// Every parameter member gets a storage slot root and, when it carries
    /// references, a value root standing for whatever the caller passed in
    fn declare_parameters(&mut self, frame: &mut FlowFrame<'_>, function: &Function) {
        let types = self.types();

        for parameter in &function.parameters {
            for (member, member_ty) in types.members(&parameter.ty) {
                let path = parameter.path.append_path(&member);
                let location = self.declare_location(&path);

                if types.is_value_type(&member_ty) {
                    frame.declare(path, LifetimeBounds::new(Lifetime::none(), location));
                    continue;
                }

                let value = Lifetime::new(path.clone(), LifetimeRole::Root, LifetimeOrigin::LocalValue);

                self.context.add_root(value.clone());
                self.context.graph.add_stored(&value, &location, Some(&member_ty));

                frame.declare(path, LifetimeBounds::new(value, location));
            }
        }
    }

    /// A returned value must not depend on anything but the heap. Once
    /// accepted it is as durable as heap data from the caller's point of view.
    fn validate_return(&mut self, function: &Function) -> Result<(), LifetimeError> {
        let returned = self.bundle(function.body).clone();

        let roots = returned
            .values()
            .flat_map(|value| self.context.graph.root_dependencies(value))
            .collect::<BTreeSet<_>>();

        if !roots.is_empty() {
            let captured = self
                .escaping_of(function.body)
                .iter()
                .flat_map(|variable| {
                    std::iter::once(variable.clone())
                        .chain(self.context.variables.captures_of(variable))
                })
                .collect::<BTreeSet<_>>();

            return Err(LifetimeError::ReturnEscape {
                function: function.path.clone(),
                span: self.owner.node(function.body).span,
                roots: roots.into_iter().collect(),
                captured: captured.into_iter().collect(),
            });
        }

        for value in returned.values() {
            self.context.graph.add_stored(value, &Lifetime::heap(), None);
        }

        tracing::debug!(values = returned.values().count(), "accepted return");
        Ok(())
    }

    /// `function(arguments...)`
    pub(super) fn analyze_call(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        function: &IdentifierPath,
        arguments: &[ItemLocalId],
    ) -> Result<(), LifetimeError> {
        for argument in arguments {
            self.analyze_expression(frame, *argument)?;
        }

        let types = self.types();

        if types.function(function).is_none() {
            ice!("call to `{function}`, which has no signature");
        }

        // The callee may stash any argument behind any reference held by
        // another argument, including array elements and pointer members
        for (i, stored) in arguments.iter().enumerate() {
            let stored = self.bundle(*stored).values().cloned().collect::<Vec<_>>();

            for (j, container) in arguments.iter().enumerate() {
                if i == j || types.is_value_type(self.type_of(*container)) {
                    continue;
                }

                let containers = self.bundle(*container).values().cloned().collect::<Vec<_>>();

                for container in &containers {
                    for value in &stored {
                        self.context.graph.add_stored(value, container, None);
                    }
                }
            }
        }

        // Returns are validated to be heap durable, so the result is a
        // fresh heap region for this call site
        let ty = self.type_of(id);
        let mut bundle = LifetimeBundle::new();
        let mut region = None;

        for (member, member_ty) in types.members(ty) {
            if types.is_value_type(&member_ty) {
                bundle.insert(member, LifetimeBounds::none());
                continue;
            }

            let region = region
                .get_or_insert_with(|| {
                    Lifetime::new(self.temp_path("call", id), LifetimeRole::Root, LifetimeOrigin::Heap)
                })
                .clone();

            bundle.insert(member, LifetimeBounds::value(region));
        }

        if let Some(region) = region {
            self.context.add_root(region);
        }

        self.record(id, bundle, BTreeSet::new());
        Ok(())
    }

    /// Literals and operators only ever produce plain values
    pub(super) fn analyze_operator(
        &mut self,
        frame: &mut FlowFrame<'_>,
        id: ItemLocalId,
        operands: &[ItemLocalId],
    ) -> Result<(), LifetimeError> {
        for operand in operands {
            self.analyze_expression(frame, *operand)?;
        }

        let bundle = self.untracked_bundle(self.type_of(id));
        self.record(id, bundle, BTreeSet::new());
        Ok(())
    }
}
