use super::{ExpressionKind, ItemLocalId, Module, Owner, OwnerKind};

pub trait Visitor: Sized {
    fn visit_owner(&mut self, owner: &Owner) {
        walk_owner(self, owner)
    }

    fn visit_expression(&mut self, owner: &Owner, id: ItemLocalId) {
        walk_expression(self, owner, id)
    }
}

pub fn walk_module(visitor: &mut impl Visitor, module: &Module) {
    for owner in module.owners.iter() {
        visitor.visit_owner(owner);
    }
}

pub fn walk_owner(visitor: &mut impl Visitor, owner: &Owner) {
    match &owner.kind {
        OwnerKind::Function(function) => visitor.visit_expression(owner, function.body),
        OwnerKind::Struct(_) | OwnerKind::Union(_) => {}
    }
}

pub fn walk_expression(visitor: &mut impl Visitor, owner: &Owner, id: ItemLocalId) {
    match &owner.node(id).kind {
        ExpressionKind::Literal(_)
        | ExpressionKind::Variable(_)
        | ExpressionKind::Break
        | ExpressionKind::Continue => {}
        ExpressionKind::AddressOf(target) | ExpressionKind::Dereference(target) => {
            visitor.visit_expression(owner, *target)
        }
        ExpressionKind::MemberAccess { target, .. } => visitor.visit_expression(owner, *target),
        ExpressionKind::Index { target, index } => {
            visitor.visit_expression(owner, *target);
            visitor.visit_expression(owner, *index);
        }
        ExpressionKind::New { initializer } => {
            if let Some(initializer) = initializer {
                visitor.visit_expression(owner, *initializer);
            }
        }
        ExpressionKind::StructLiteral { fields } => {
            for (_, field) in fields {
                visitor.visit_expression(owner, *field);
            }
        }
        ExpressionKind::Unary { operand, .. } => visitor.visit_expression(owner, *operand),
        ExpressionKind::Binary { lhs, rhs, .. } => {
            visitor.visit_expression(owner, *lhs);
            visitor.visit_expression(owner, *rhs);
        }
        ExpressionKind::Call { arguments, .. } => {
            for argument in arguments {
                visitor.visit_expression(owner, *argument);
            }
        }
        ExpressionKind::Block(statements) => {
            for statement in statements {
                visitor.visit_expression(owner, *statement);
            }
        }
        ExpressionKind::VariableDeclaration { value, .. } => visitor.visit_expression(owner, *value),
        ExpressionKind::Assignment { target, value } => {
            visitor.visit_expression(owner, *target);
            visitor.visit_expression(owner, *value);
        }
        ExpressionKind::If {
            condition,
            positive,
            negative,
        } => {
            visitor.visit_expression(owner, *condition);
            visitor.visit_expression(owner, *positive);

            if let Some(n) = negative {
                visitor.visit_expression(owner, *n);
            }
        }
        ExpressionKind::While { condition, body } => {
            visitor.visit_expression(owner, *condition);
            visitor.visit_expression(owner, *body);
        }
    }
}
