use colored::Colorize;
use itertools::Itertools;
use thiserror::Error;

use super::lifetime::Lifetime;
use crate::{
    frontend::{SourceFile, Span},
    middle::path::IdentifierPath,
};

/// A program that cannot be proven memory safe
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifetimeError {
    #[error(
        "value returned from `{function}` may outlive the region(s) backing it: {}",
        join_roots(.roots)
    )]
    ReturnEscape {
        function: IdentifierPath,
        span: Span,
        roots: Vec<Lifetime>,
        /// Variables the returned value holds on to
        captured: Vec<IdentifierPath>,
    },
    #[error(
        "value stored into heap memory may outlive the region(s) backing it: {}",
        join_roots(.roots)
    )]
    HeapStore { span: Span, roots: Vec<Lifetime> },
}

fn join_roots(roots: &[Lifetime]) -> String {
    roots.iter().map(|root| format!("`{}`", root.path())).join(", ")
}

impl LifetimeError {
    pub fn span(&self) -> Span {
        match self {
            LifetimeError::ReturnEscape { span, .. } | LifetimeError::HeapStore { span, .. } => {
                *span
            }
        }
    }

    /// The offending non-heap roots, sorted
    pub fn roots(&self) -> &[Lifetime] {
        match self {
            LifetimeError::ReturnEscape { roots, .. } | LifetimeError::HeapStore { roots, .. } => {
                roots
            }
        }
    }

    /// Formats the error as a diagnostic pointing into `source`
    pub fn render(&self, source: &SourceFile) -> String {
        let span = self.span();

        let mut rendered = format!(
            "{}: {} {}\n{}",
            "error".red(),
            self,
            format!("(at {})", source.format_span_position(span)).white(),
            source.highlight_span(span)
        );

        if let LifetimeError::ReturnEscape { captured, .. } = self {
            if !captured.is_empty() {
                rendered.push_str(&format!(
                    "\n{}: the returned value holds on to {}",
                    "note".blue(),
                    captured.iter().map(|variable| format!("`{variable}`")).join(", ")
                ));
            }
        }

        rendered.push_str(&format!(
            "\n{}: copy the data into a heap allocation (`new`) before it escapes",
            "help".cyan()
        ));

        rendered
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        frontend::SourceFileOrigin,
        middle::flow::lifetime::{LifetimeOrigin, LifetimeRole},
    };

    fn stack_slot(path: &str) -> Lifetime {
        Lifetime::new(IdentifierPath::from(path), LifetimeRole::Root, LifetimeOrigin::LocalLocation)
    }

    #[test]
    fn messages_name_every_root() {
        let error = LifetimeError::HeapStore {
            span: Span::new(0, 1),
            roots: vec![stack_slot("f::a"), stack_slot("f::b")],
        };

        assert_eq!(
            error.to_string(),
            "value stored into heap memory may outlive the region(s) backing it: `f::a`, `f::b`"
        );
        assert_eq!(error.span(), Span::new(0, 1));
        assert_eq!(error.roots().len(), 2);
    }

    #[test]
    fn heap_store_render_has_no_note() {
        let source = SourceFile::new("*p = &x;\n", SourceFileOrigin::Memory);
        let error = LifetimeError::HeapStore {
            span: Span::new(5, 7),
            roots: vec![stack_slot("f::x")],
        };

        let rendered = strip_ansi_escapes::strip_str(error.render(&source));

        assert_eq!(
            rendered,
            "error: value stored into heap memory may outlive the region(s) backing it: `f::x` (at <memory>:1:6)\n  \
             |\n1 | *p = &x;\n  |      ^^\n\
             help: copy the data into a heap allocation (`new`) before it escapes"
        );
    }
}
