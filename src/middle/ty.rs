//! Structural type model handed down by the type checker
//!
//! Flow analysis never infers types. It only asks two questions of this
//! module: which member paths does a type have, and does a value of the type
//! carry references (its passing semantics).

use std::{collections::BTreeMap, rc::Rc};

use colored::Colorize;
use hashbrown::HashSet;
use strum::Display;

use crate::{frontend::intern::InternedSymbol, macros::ice, middle::path::IdentifierPath};

#[doc(hidden)]
mod private {
    #[doc(hidden)]
    #[derive(Debug, Clone, PartialEq, Eq, Hash)]
    pub struct PrivateZst;
}

/// Thin pointer to an interned type kind. Do not construct directly. Instead,
/// use [`TypeContext::intern_type`]
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Type(Rc<TypeKind>, private::PrivateZst);

impl Type {
    fn new_from_reference_only_for_interning(kind: Rc<TypeKind>) -> Self {
        Self(kind, private::PrivateZst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// void
    Void,
    /// int
    Int,
    /// bool
    Bool,
    /// T*
    Pointer(Type),
    /// T[]
    ///
    /// A pointer to some number of T's
    Array(Type),
    /// A user declared struct, union or function referred to by name
    Nominal(IdentifierPath, NominalKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NominalKind {
    Struct,
    Union,
    Function,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum PassingSemantics {
    /// Copying the value copies everything it means. Needs no lifetime
    ValueType,
    /// An aggregate with at least one reference somewhere inside it
    ContainsReferenceType,
    /// The value is itself a reference to other storage
    ReferenceType,
}

impl core::fmt::Debug for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Type").field(&self.0).finish()
    }
}

impl core::ops::Deref for Type {
    type Target = TypeKind;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl TypeKind {
    pub fn is_void(&self) -> bool {
        matches!(self, TypeKind::Void)
    }

    /// The type reached by dereferencing or indexing this type
    pub fn inner_type(&self) -> Option<&Type> {
        match self {
            TypeKind::Pointer(inner) | TypeKind::Array(inner) => Some(inner),
            _ => None,
        }
    }
}

impl core::fmt::Display for TypeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Int => write!(f, "int"),
            Self::Bool => write!(f, "bool"),
            Self::Pointer(ty) => write!(f, "{}*", **ty),
            Self::Array(ty) => write!(f, "{}[]", **ty),
            Self::Nominal(path, _) => match path.last() {
                Some(name) => write!(f, "{name}"),
                None => write!(f, "{{anonymous}}"),
            },
        }
    }
}

impl core::fmt::Display for Type {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.colored().yellow())
    }
}

impl From<Type> for colored::ColoredString {
    fn from(s: Type) -> Self {
        (*s).to_string().into()
    }
}

impl Type {
    pub fn colored(&self) -> colored::ColoredString {
        self.clone().into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum AggregateKind {
    Struct,
    Union,
}

#[derive(Debug, Clone)]
pub struct AggregateMember {
    pub name: InternedSymbol,
    pub ty: Type,
    pub is_writable: bool,
}

#[derive(Debug, Clone)]
pub struct AggregateSignature {
    pub path: IdentifierPath,
    pub kind: AggregateKind,
    pub members: Vec<AggregateMember>,
}

impl AggregateSignature {
    pub fn member(&self, name: InternedSymbol) -> Option<&AggregateMember> {
        self.members.iter().find(|member| member.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ParameterSignature {
    pub name: InternedSymbol,
    pub ty: Type,
    pub is_writable: bool,
}

#[derive(Debug, Clone)]
pub struct FunctionSignature {
    pub path: IdentifierPath,
    pub parameters: Vec<ParameterSignature>,
    pub return_type: Type,
}

/// Interned types plus the signature tables of every declared aggregate and
/// function in the compilation unit
#[derive(Debug, Default)]
pub struct TypeContext {
    /// Type interning table to prevent duplicate types
    type_table: HashSet<Rc<TypeKind>>,
    aggregates: BTreeMap<IdentifierPath, AggregateSignature>,
    functions: BTreeMap<IdentifierPath, FunctionSignature>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern_type(&mut self, kind: TypeKind) -> Type {
        let rc = self.type_table.get_or_insert(Rc::new(kind));

        Type::new_from_reference_only_for_interning(rc.clone())
    }

    pub fn void(&mut self) -> Type {
        self.intern_type(TypeKind::Void)
    }

    pub fn int(&mut self) -> Type {
        self.intern_type(TypeKind::Int)
    }

    pub fn bool(&mut self) -> Type {
        self.intern_type(TypeKind::Bool)
    }

    pub fn pointer(&mut self, inner: Type) -> Type {
        self.intern_type(TypeKind::Pointer(inner))
    }

    pub fn array(&mut self, inner: Type) -> Type {
        self.intern_type(TypeKind::Array(inner))
    }

    pub fn declare_aggregate(&mut self, signature: AggregateSignature) -> Type {
        let kind = match signature.kind {
            AggregateKind::Struct => NominalKind::Struct,
            AggregateKind::Union => NominalKind::Union,
        };

        let ty = self.intern_type(TypeKind::Nominal(signature.path.clone(), kind));

        if self.aggregates.contains_key(&signature.path) {
            ice!("aggregate `{}` was declared twice", signature.path);
        }

        self.aggregates.insert(signature.path.clone(), signature);
        ty
    }

    pub fn declare_function(&mut self, signature: FunctionSignature) -> Type {
        let ty = self.intern_type(TypeKind::Nominal(
            signature.path.clone(),
            NominalKind::Function,
        ));

        if self.functions.contains_key(&signature.path) {
            ice!("function `{}` was declared twice", signature.path);
        }

        self.functions.insert(signature.path.clone(), signature);
        ty
    }

    pub fn aggregate(&self, path: &IdentifierPath) -> Option<&AggregateSignature> {
        self.aggregates.get(path)
    }

    pub fn function(&self, path: &IdentifierPath) -> Option<&FunctionSignature> {
        self.functions.get(path)
    }

    fn aggregate_of(&self, ty: &Type) -> Option<&AggregateSignature> {
        match &**ty {
            TypeKind::Nominal(path, NominalKind::Struct | NominalKind::Union) => {
                match self.aggregates.get(path) {
                    Some(signature) => Some(signature),
                    None => ice!("type `{path}` refers to an undeclared aggregate"),
                }
            }
            _ => None,
        }
    }

    pub fn member_type(&self, ty: &Type, member: InternedSymbol) -> Option<Type> {
        self.aggregate_of(ty)
            .and_then(|signature| signature.member(member))
            .map(|member| member.ty.clone())
    }

    pub fn semantics(&self, ty: &Type) -> PassingSemantics {
        self.semantics_guarded(ty, &mut Vec::new())
    }

    fn semantics_guarded(&self, ty: &Type, visiting: &mut Vec<IdentifierPath>) -> PassingSemantics {
        match &**ty {
            TypeKind::Void | TypeKind::Int | TypeKind::Bool => PassingSemantics::ValueType,
            TypeKind::Nominal(_, NominalKind::Function) => PassingSemantics::ValueType,
            TypeKind::Pointer(_) | TypeKind::Array(_) => PassingSemantics::ReferenceType,
            TypeKind::Nominal(path, _) => {
                let Some(signature) = self.aggregate_of(ty) else {
                    return PassingSemantics::ValueType;
                };

                if visiting.contains(path) {
                    return PassingSemantics::ValueType;
                }

                visiting.push(path.clone());

                let contains_reference = signature.members.iter().any(|member| {
                    self.semantics_guarded(&member.ty, visiting) != PassingSemantics::ValueType
                });

                visiting.pop();

                if contains_reference {
                    PassingSemantics::ContainsReferenceType
                } else {
                    PassingSemantics::ValueType
                }
            }
        }
    }

    pub fn is_value_type(&self, ty: &Type) -> bool {
        self.semantics(ty) == PassingSemantics::ValueType
    }

    /// Enumerates the relative member paths of `ty` together with the type
    /// found at each path. The whole value (empty path) always comes first
    /// unless the type is `void`, which has no members at all.
    pub fn members(&self, ty: &Type) -> Vec<(IdentifierPath, Type)> {
        let mut members = Vec::new();

        if !ty.is_void() {
            self.collect_members(ty, IdentifierPath::new(), &mut Vec::new(), &mut members);
        }

        members
    }

    fn collect_members(
        &self,
        ty: &Type,
        prefix: IdentifierPath,
        visiting: &mut Vec<IdentifierPath>,
        members: &mut Vec<(IdentifierPath, Type)>,
    ) {
        members.push((prefix.clone(), ty.clone()));

        let Some(signature) = self.aggregate_of(ty) else {
            return;
        };

        if visiting.contains(&signature.path) {
            return;
        }

        visiting.push(signature.path.clone());

        for member in &signature.members {
            self.collect_members(&member.ty, prefix.append(member.name), visiting, members);
        }

        visiting.pop();
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn declare_struct(tcx: &mut TypeContext, name: &str, members: Vec<(&str, Type)>) -> Type {
        tcx.declare_aggregate(AggregateSignature {
            path: IdentifierPath::from(name),
            kind: AggregateKind::Struct,
            members: members
                .into_iter()
                .map(|(name, ty)| AggregateMember {
                    name: InternedSymbol::new(name),
                    ty,
                    is_writable: true,
                })
                .collect(),
        })
    }

    #[test]
    fn types_are_interned() {
        let mut tcx = TypeContext::new();
        let a = tcx.int();
        let b = tcx.int();
        let pa = tcx.pointer(a.clone());

        assert_eq!(a, b);
        assert!(Rc::ptr_eq(&a.0, &b.0));
        assert_eq!(pa.inner_type(), Some(&a));
        assert_eq!((*pa).to_string(), "int*");
    }

    #[test]
    fn passing_semantics() {
        let mut tcx = TypeContext::new();
        let int = tcx.int();
        let int_ptr = tcx.pointer(int.clone());
        let plain = declare_struct(&mut tcx, "Plain", vec![("a", int.clone())]);
        let holder = declare_struct(&mut tcx, "Holder", vec![("a", int.clone()), ("b", int_ptr.clone())]);

        assert_eq!(tcx.semantics(&int), PassingSemantics::ValueType);
        assert_eq!(tcx.semantics(&int_ptr), PassingSemantics::ReferenceType);
        assert_eq!(tcx.semantics(&plain), PassingSemantics::ValueType);
        assert_eq!(tcx.semantics(&holder), PassingSemantics::ContainsReferenceType);
    }

    #[test]
    fn members_stop_at_pointers() {
        let mut tcx = TypeContext::new();
        let int = tcx.int();
        let node_ty = tcx.intern_type(TypeKind::Nominal(
            IdentifierPath::from("Node"),
            NominalKind::Struct,
        ));
        let node_ptr = tcx.pointer(node_ty);
        let node = declare_struct(&mut tcx, "Node", vec![("value", int), ("next", node_ptr)]);

        let paths = tcx
            .members(&node)
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect::<Vec<_>>();

        assert_eq!(paths, vec!["<whole>", "value", "next"]);

        let void = tcx.void();
        assert!(tcx.members(&void).is_empty());
    }

    #[test]
    fn nested_members_are_prefixed() {
        let mut tcx = TypeContext::new();
        let int = tcx.int();
        let int_ptr = tcx.pointer(int.clone());
        let inner = declare_struct(&mut tcx, "Inner", vec![("p", int_ptr)]);
        let outer = declare_struct(&mut tcx, "Outer", vec![("inner", inner), ("n", int)]);

        let paths = tcx
            .members(&outer)
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect::<Vec<_>>();

        assert_eq!(paths, vec!["<whole>", "inner", "inner::p", "n"]);
    }
}
