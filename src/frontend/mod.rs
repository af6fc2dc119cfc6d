use std::path::PathBuf;

use colored::Colorize;

pub use self::span::Span;

pub mod intern;
pub mod span;

#[derive(Debug)]
pub struct SourceFile {
    pub contents: String,
    pub origin: SourceFileOrigin,
}

impl SourceFile {
    pub fn new(contents: impl Into<String>, origin: SourceFileOrigin) -> Self {
        Self {
            contents: contents.into(),
            origin,
        }
    }

    /// 1-based line number containing the byte at `position`
    pub fn row_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        self.contents[..position].matches('\n').count() + 1
    }

    /// 1-based column of the byte at `position` within its line
    pub fn column_for_position(&self, position: usize) -> usize {
        let position = position.min(self.contents.len());

        position - self.line_start(position) + 1
    }

    pub fn format_span_position(&self, span: Span) -> String {
        format!(
            "{}:{}:{}",
            self.origin,
            self.row_for_position(span.start),
            self.column_for_position(span.start)
        )
    }

    /// Renders the line containing the start of `span` with the spanned
    /// section underlined. Spans crossing a line boundary are underlined to
    /// the end of the first line.
    pub fn highlight_span(&self, span: Span) -> String {
        let start = span.start.min(self.contents.len());
        let line_start = self.line_start(start);
        let line_end = self.contents[start..]
            .find('\n')
            .map(|offset| start + offset)
            .unwrap_or(self.contents.len());

        let line = &self.contents[line_start..line_end];
        let row = self.row_for_position(start).to_string();
        let gutter = " ".repeat(row.len());

        let end = span.end.clamp(start, line_end);
        let padding = " ".repeat(self.contents[line_start..start].chars().count());
        let marker = "^".repeat(self.contents[start..end].chars().count().max(1));

        format!(
            "{gutter} {}\n{} {} {line}\n{gutter} {} {padding}{}",
            "|".blue(),
            row.blue(),
            "|".blue(),
            "|".blue(),
            marker.red()
        )
    }

    fn line_start(&self, position: usize) -> usize {
        self.contents[..position]
            .rfind('\n')
            .map(|index| index + 1)
            .unwrap_or(0)
    }
}

#[derive(Debug)]
pub enum SourceFileOrigin {
    Memory,
    File(PathBuf),
}

impl core::fmt::Display for SourceFileOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceFileOrigin::Memory => f.write_str("<memory>"),
            SourceFileOrigin::File(path) => f.write_fmt(format_args!("{}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn positions_are_one_based() {
        let source = SourceFile::new("ab\ncde\n", SourceFileOrigin::Memory);

        assert_eq!(source.row_for_position(0), 1);
        assert_eq!(source.column_for_position(0), 1);
        assert_eq!(source.row_for_position(4), 2);
        assert_eq!(source.column_for_position(4), 2);
        assert_eq!(source.format_span_position(Span::new(4, 5)), "<memory>:2:2");
    }

    #[test]
    fn highlight_underlines_span() {
        let source = SourceFile::new("let a = 1;\nreturn &a;\n", SourceFileOrigin::Memory);
        let rendered = source.highlight_span(Span::new(18, 20));
        let rendered = strip_ansi_escapes::strip_str(rendered);

        assert_eq!(
            rendered,
            indoc! {"
                  |
                2 | return &a;
                  |        ^^"}
        );
    }
}
