//! Construction of typed HIR modules
//!
//! The builders stand in for the lowering and type checking passes: they
//! allocate node ids, compute the structural type of every node from its
//! children and resolve local names to fully scoped variable paths. Handing
//! them an ill-typed program is a bug in the caller and panics.

use hashbrown::HashMap;

use super::{
    BinaryOperatorKind, Expression, ExpressionKind, Function, HirId, ItemLocalId, Literal,
    LocalDefId, Module, Owner, OwnerKind, Parameter, UnaryOperatorKind,
};
use crate::{
    frontend::{Span, intern::InternedSymbol},
    index::IndexVec,
    macros::ice,
    middle::{
        path::IdentifierPath,
        ty::{
            AggregateKind, AggregateMember, AggregateSignature, FunctionSignature, NominalKind,
            ParameterSignature, Type, TypeContext, TypeKind,
        },
    },
};

pub struct ModuleBuilder<'tcx> {
    types: &'tcx mut TypeContext,
    module: Module,
}

impl<'tcx> ModuleBuilder<'tcx> {
    pub fn new(types: &'tcx mut TypeContext) -> Self {
        Self {
            types,
            module: Module::default(),
        }
    }

    pub fn types(&mut self) -> &mut TypeContext {
        &mut *self.types
    }

    /// Names an aggregate before it is declared so that it can refer to
    /// itself through a pointer
    pub fn forward_struct(&mut self, name: &str) -> Type {
        self.types.intern_type(TypeKind::Nominal(
            IdentifierPath::from(name),
            NominalKind::Struct,
        ))
    }

    pub fn declare_struct(&mut self, name: &str, members: &[(&str, Type)]) -> Type {
        self.declare_aggregate(name, AggregateKind::Struct, members)
    }

    pub fn declare_union(&mut self, name: &str, members: &[(&str, Type)]) -> Type {
        self.declare_aggregate(name, AggregateKind::Union, members)
    }

    fn declare_aggregate(&mut self, name: &str, kind: AggregateKind, members: &[(&str, Type)]) -> Type {
        let path = IdentifierPath::from(name);

        let ty = self.types.declare_aggregate(AggregateSignature {
            path: path.clone(),
            kind,
            members: members
                .iter()
                .map(|(name, ty)| AggregateMember {
                    name: InternedSymbol::new(name),
                    ty: ty.clone(),
                    is_writable: true,
                })
                .collect(),
        });

        let def_id = self.module.owners.next_index();
        let kind = match kind {
            AggregateKind::Struct => OwnerKind::Struct(path),
            AggregateKind::Union => OwnerKind::Union(path),
        };

        self.module.owners.push(Owner {
            def_id,
            kind,
            nodes: IndexVec::new(),
            span: Span::default(),
        });

        ty
    }

    /// Declares a function signature without a body so that it can be called
    /// before (or without) being defined
    pub fn declare_function(&mut self, name: &str, parameters: &[(&str, Type)], return_type: Type) -> Type {
        self.types.declare_function(FunctionSignature {
            path: IdentifierPath::from(name),
            parameters: parameters
                .iter()
                .map(|(name, ty)| ParameterSignature {
                    name: InternedSymbol::new(name),
                    ty: ty.clone(),
                    is_writable: true,
                })
                .collect(),
            return_type,
        })
    }

    /// Declares and defines a function in one go
    pub fn function(
        &mut self,
        name: &str,
        parameters: &[(&str, Type)],
        return_type: Type,
        build: impl FnOnce(&mut BodyBuilder<'_>) -> ItemLocalId,
    ) -> LocalDefId {
        self.declare_function(name, parameters, return_type);
        self.define_function(name, build)
    }

    /// Builds the body of a previously declared function
    pub fn define_function(
        &mut self,
        name: &str,
        build: impl FnOnce(&mut BodyBuilder<'_>) -> ItemLocalId,
    ) -> LocalDefId {
        let path = IdentifierPath::from(name);

        let Some(signature) = self.types.function(&path).cloned() else {
            ice!("tried to define undeclared function `{path}`");
        };

        let def_id = self.module.owners.next_index();

        let parameters = signature
            .parameters
            .iter()
            .map(|parameter| Parameter {
                name: parameter.name,
                path: path.append(parameter.name),
                ty: parameter.ty.clone(),
                is_writable: parameter.is_writable,
                span: Span::default(),
            })
            .collect::<Vec<_>>();

        let mut body = BodyBuilder::new(&mut *self.types, def_id, path.clone());

        for parameter in &parameters {
            body.bind(parameter.name, parameter.path.clone(), parameter.ty.clone());
        }

        let body_id = build(&mut body);
        let body_ty = body.type_of(body_id);

        if !signature.return_type.is_void() && body_ty != signature.return_type {
            ice!(
                "body of `{path}` has type {} but the signature returns {}",
                body_ty,
                signature.return_type
            );
        }

        let nodes = body.finish();

        self.module.owners.push(Owner {
            def_id,
            kind: OwnerKind::Function(Function {
                path,
                parameters,
                return_type: signature.return_type,
                body: body_id,
            }),
            nodes,
            span: Span::default(),
        });

        def_id
    }

    pub fn finish(self) -> Module {
        self.module
    }
}

#[derive(Debug)]
struct Scope {
    path: IdentifierPath,
    bindings: HashMap<InternedSymbol, (IdentifierPath, Type)>,
}

pub struct BodyBuilder<'a> {
    types: &'a mut TypeContext,
    owner_id: LocalDefId,
    nodes: IndexVec<ItemLocalId, Expression>,
    scopes: Vec<Scope>,
    next_block: usize,
    next_span: Option<Span>,
}

impl<'a> BodyBuilder<'a> {
    fn new(types: &'a mut TypeContext, owner_id: LocalDefId, function_path: IdentifierPath) -> Self {
        Self {
            types,
            owner_id,
            nodes: IndexVec::new(),
            scopes: vec![Scope {
                path: function_path,
                bindings: HashMap::new(),
            }],
            next_block: 0,
            next_span: None,
        }
    }

    fn finish(self) -> IndexVec<ItemLocalId, Expression> {
        self.nodes
    }

    pub fn types(&mut self) -> &mut TypeContext {
        &mut *self.types
    }

    /// Attaches a source span to the next node created
    pub fn at(&mut self, span: Span) -> &mut Self {
        self.next_span = Some(span);
        self
    }

    pub fn type_of(&self, id: ItemLocalId) -> Type {
        match self.nodes.get(id) {
            Some(node) => node.ty.clone(),
            None => ice!("node {id:?} has not been built yet"),
        }
    }

    fn kind_of(&self, id: ItemLocalId) -> &ExpressionKind {
        &self.nodes[id].kind
    }

    fn push(&mut self, kind: ExpressionKind, ty: Type) -> ItemLocalId {
        let local_id = self.nodes.next_index();

        self.nodes.push(Expression {
            hir_id: HirId::new(self.owner_id, local_id),
            kind,
            ty,
            span: self.next_span.take().unwrap_or_default(),
        })
    }

    fn current_scope(&mut self) -> &mut Scope {
        match self.scopes.last_mut() {
            Some(scope) => scope,
            None => ice!("body builder has no open scope"),
        }
    }

    fn bind(&mut self, name: InternedSymbol, path: IdentifierPath, ty: Type) {
        let scope = self.current_scope();

        if scope.bindings.insert(name, (path, ty)).is_some() {
            ice!("`{name}` was declared twice in the same scope");
        }
    }

    fn expect_place(&self, id: ItemLocalId) {
        if !self.kind_of(id).is_place() {
            ice!("expression {id:?} is not a place: {:?}", self.kind_of(id));
        }
    }

    pub fn int(&mut self, value: i64) -> ItemLocalId {
        let ty = self.types.int();
        self.push(ExpressionKind::Literal(Literal::Int(value)), ty)
    }

    pub fn bool(&mut self, value: bool) -> ItemLocalId {
        let ty = self.types.bool();
        self.push(ExpressionKind::Literal(Literal::Bool(value)), ty)
    }

    pub fn void(&mut self) -> ItemLocalId {
        let ty = self.types.void();
        self.push(ExpressionKind::Literal(Literal::Void), ty)
    }

    pub fn variable(&mut self, name: &str) -> ItemLocalId {
        let symbol = InternedSymbol::new(name);

        let Some((path, ty)) = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.bindings.get(&symbol))
            .cloned()
        else {
            ice!("unresolved variable `{name}`");
        };

        self.push(ExpressionKind::Variable(path), ty)
    }

    pub fn address_of(&mut self, target: ItemLocalId) -> ItemLocalId {
        self.expect_place(target);

        let inner = self.type_of(target);
        let ty = self.types.pointer(inner);

        self.push(ExpressionKind::AddressOf(target), ty)
    }

    pub fn deref(&mut self, target: ItemLocalId) -> ItemLocalId {
        let target_ty = self.type_of(target);

        let TypeKind::Pointer(inner) = &*target_ty else {
            ice!("cannot dereference non-pointer type {target_ty}");
        };

        self.push(ExpressionKind::Dereference(target), inner.clone())
    }

    pub fn member(&mut self, target: ItemLocalId, name: &str) -> ItemLocalId {
        let member = InternedSymbol::new(name);
        let target_ty = self.type_of(target);

        let Some(ty) = self.types.member_type(&target_ty, member) else {
            ice!("type {target_ty} has no member `{name}`");
        };

        self.push(ExpressionKind::MemberAccess { target, member }, ty)
    }

    pub fn index(&mut self, target: ItemLocalId, index: ItemLocalId) -> ItemLocalId {
        let target_ty = self.type_of(target);

        let TypeKind::Array(element) = &*target_ty else {
            ice!("cannot index non-array type {target_ty}");
        };

        self.push(ExpressionKind::Index { target, index }, element.clone())
    }

    /// Allocates a default initialized `ty` on the heap
    pub fn new_default(&mut self, ty: Type) -> ItemLocalId {
        let ty = self.types.pointer(ty);
        self.push(ExpressionKind::New { initializer: None }, ty)
    }

    /// Allocates a copy of `initializer` on the heap
    pub fn new_with(&mut self, initializer: ItemLocalId) -> ItemLocalId {
        let inner = self.type_of(initializer);
        let ty = self.types.pointer(inner);

        self.push(
            ExpressionKind::New {
                initializer: Some(initializer),
            },
            ty,
        )
    }

    pub fn struct_literal(&mut self, ty: Type, fields: &[(&str, ItemLocalId)]) -> ItemLocalId {
        let fields = fields
            .iter()
            .map(|(name, value)| {
                let name = InternedSymbol::new(name);

                if self.types.member_type(&ty, name).is_none() {
                    ice!("type {ty} has no member `{name}`");
                }

                (name, *value)
            })
            .collect();

        self.push(ExpressionKind::StructLiteral { fields }, ty)
    }

    pub fn unary(&mut self, operator: UnaryOperatorKind, operand: ItemLocalId) -> ItemLocalId {
        let ty = match operator {
            UnaryOperatorKind::Not => self.types.bool(),
            UnaryOperatorKind::Negate => {
                let operand_ty = self.type_of(operand);

                if !matches!(*operand_ty, TypeKind::Int) {
                    ice!("cannot negate {operand_ty}");
                }

                operand_ty
            }
        };

        self.push(ExpressionKind::Unary { operator, operand }, ty)
    }

    pub fn binary(&mut self, operator: BinaryOperatorKind, lhs: ItemLocalId, rhs: ItemLocalId) -> ItemLocalId {
        let ty = if operator.is_boolean() {
            self.types.bool()
        } else {
            let lhs_ty = self.type_of(lhs);

            if !matches!(*lhs_ty, TypeKind::Int | TypeKind::Bool) {
                ice!("operator {operator} cannot be applied to {lhs_ty}");
            }

            lhs_ty
        };

        self.push(ExpressionKind::Binary { operator, lhs, rhs }, ty)
    }

    pub fn call(&mut self, name: &str, arguments: &[ItemLocalId]) -> ItemLocalId {
        let function = IdentifierPath::from(name);

        let Some(signature) = self.types.function(&function) else {
            ice!("call to undeclared function `{function}`");
        };

        if signature.parameters.len() != arguments.len() {
            ice!(
                "`{function}` takes {} argument(s) but {} were given",
                signature.parameters.len(),
                arguments.len()
            );
        }

        let ty = signature.return_type.clone();

        self.push(
            ExpressionKind::Call {
                function,
                arguments: arguments.to_vec(),
            },
            ty,
        )
    }

    /// `var name = value;` in the innermost open scope
    pub fn declare(&mut self, name: &str, value: ItemLocalId) -> ItemLocalId {
        let symbol = InternedSymbol::new(name);
        let path = self.current_scope().path.append(symbol);
        let value_ty = self.type_of(value);

        self.bind(symbol, path.clone(), value_ty);

        let ty = self.types.void();
        self.push(ExpressionKind::VariableDeclaration { path, value }, ty)
    }

    pub fn assign(&mut self, target: ItemLocalId, value: ItemLocalId) -> ItemLocalId {
        self.expect_place(target);

        let target_ty = self.type_of(target);
        let value_ty = self.type_of(value);

        if target_ty != value_ty {
            ice!("cannot assign {value_ty} to a place of type {target_ty}");
        }

        let ty = self.types.void();
        self.push(ExpressionKind::Assignment { target, value }, ty)
    }

    /// Opens a new lexical scope, builds its statements and closes it again.
    /// The block evaluates to its last statement.
    pub fn block(&mut self, build: impl FnOnce(&mut Self) -> Vec<ItemLocalId>) -> ItemLocalId {
        let span = self.next_span.take();
        let name = format!("$block_{}", self.next_block);
        let path = self.current_scope().path.append(name.as_str());

        self.next_block += 1;
        self.scopes.push(Scope {
            path,
            bindings: HashMap::new(),
        });

        let statements = build(self);

        self.scopes.pop();

        let ty = match statements.last() {
            Some(last) => self.type_of(*last),
            None => self.types.void(),
        };

        self.next_span = span;
        self.push(ExpressionKind::Block(statements), ty)
    }

    pub fn if_(&mut self, condition: ItemLocalId, positive: ItemLocalId, negative: Option<ItemLocalId>) -> ItemLocalId {
        let ty = match negative {
            Some(negative) => {
                let positive_ty = self.type_of(positive);
                let negative_ty = self.type_of(negative);

                if positive_ty != negative_ty {
                    self.types.void()
                } else {
                    positive_ty
                }
            }
            None => self.types.void(),
        };

        self.push(
            ExpressionKind::If {
                condition,
                positive,
                negative,
            },
            ty,
        )
    }

    pub fn while_(&mut self, condition: ItemLocalId, body: ItemLocalId) -> ItemLocalId {
        let ty = self.types.void();
        self.push(ExpressionKind::While { condition, body }, ty)
    }

    pub fn break_(&mut self) -> ItemLocalId {
        let ty = self.types.void();
        self.push(ExpressionKind::Break, ty)
    }

    pub fn continue_(&mut self) -> ItemLocalId {
        let ty = self.types.void();
        self.push(ExpressionKind::Continue, ty)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn scoped_paths_and_types() {
        let mut tcx = TypeContext::new();
        let mut builder = ModuleBuilder::new(&mut tcx);
        let int = builder.types().int();
        let int_ptr = builder.types().pointer(int.clone());

        let def_id = builder.function("main", &[("n", int.clone())], int_ptr.clone(), |b| {
            b.block(|b| {
                let n = b.variable("n");
                let decl = b.declare("x", n);
                let x = b.variable("x");
                let address = b.address_of(x);
                vec![decl, address]
            })
        });

        let module = builder.finish();
        let owner = module.owner(def_id);
        let function = owner.function().expect("function owner");

        assert_eq!(function.parameters[0].path.to_string(), "main::n");
        assert_eq!(owner.node(function.body).ty, int_ptr);

        let declared = owner
            .nodes
            .iter()
            .find_map(|node| match &node.kind {
                ExpressionKind::VariableDeclaration { path, .. } => Some(path.to_string()),
                _ => None,
            })
            .expect("declaration");

        assert_eq!(declared, "main::$block_0::x");
    }

    #[test]
    #[should_panic(expected = "internal compiler error")]
    fn dereferencing_non_pointer_is_a_bug() {
        let mut tcx = TypeContext::new();
        let mut builder = ModuleBuilder::new(&mut tcx);
        let void = builder.types().void();

        builder.function("bad", &[], void, |b| {
            let one = b.int(1);
            b.deref(one)
        });
    }
}
