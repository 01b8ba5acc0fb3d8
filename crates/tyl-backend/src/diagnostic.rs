//! User-facing rendering of [`EmitError`] through `codespan-reporting`.
//!
//! Grounded on `raya-checker::diagnostic`: `BadInput` errors carry a source
//! span and render with a caret under the offending text; the other three
//! error kinds (`OffsetOverflow`, `ImportNotResolved`, `Internal`) are not
//! the user's fault at a specific location, so they render as a plain
//! message with no label.

use codespan_reporting::diagnostic::{Diagnostic as CsDiagnostic, Label, Severity};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use codespan_reporting::term::termcolor::{ColorChoice, StandardStream};

use crate::error::EmitError;

pub fn to_codespan(error: &EmitError, file_id: usize) -> CsDiagnostic<usize> {
    match error {
        EmitError::BadInput { what, span } => CsDiagnostic::new(Severity::Error)
            .with_message(format!("unsupported construct: {what}"))
            .with_labels(vec![Label::primary(file_id, span.as_range())
                .with_message("this construct has no native lowering")]),
        EmitError::OffsetOverflow { context } => CsDiagnostic::new(Severity::Error)
            .with_message(format!("offset overflow while emitting {context}"))
            .with_notes(vec![
                "the computed RIP-relative displacement does not fit in 32 bits".to_string(),
            ]),
        EmitError::ImportNotResolved { name } => CsDiagnostic::new(Severity::Error)
            .with_message(format!("unresolved import `{name}`"))
            .with_notes(vec!["no matching entry in the PE import table".to_string()]),
        EmitError::Internal { message } => CsDiagnostic::new(Severity::Bug)
            .with_message(format!("internal compiler error: {message}"))
            .with_notes(vec!["this indicates a compiler bug, not a user error".to_string()]),
    }
}

/// Render `error` to stderr with source context from `files`.
pub fn emit(
    error: &EmitError,
    files: &SimpleFiles<String, String>,
    file_id: usize,
) -> Result<(), codespan_reporting::files::Error> {
    let mut writer = StandardStream::stderr(ColorChoice::Auto);
    let config = term::Config::default();
    let diagnostic = to_codespan(error, file_id);
    term::emit(&mut writer, &config, files, &diagnostic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;

    #[test]
    fn bad_input_gets_a_primary_label() {
        let err = EmitError::bad_input("nullish coalescing", Span::new(4, 10));
        let diag = to_codespan(&err, 0);
        assert_eq!(diag.labels.len(), 1);
        assert_eq!(diag.severity, Severity::Error);
    }

    #[test]
    fn internal_error_is_a_bug_with_no_label() {
        let err = EmitError::internal("register with no stack home");
        let diag = to_codespan(&err, 0);
        assert!(diag.labels.is_empty());
        assert_eq!(diag.severity, Severity::Bug);
    }
}
