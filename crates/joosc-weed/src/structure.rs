//! Joos allows at most one top-level type per compilation unit, and that
//! type's name must match the file's stem (`Foo` must live in `Foo.java`).

use joosc_ast::Program;
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::files::FileSet;
use joosc_common::span::FileSpan;

pub fn check(files: &FileSet, program: &Program, errors: &mut Vec<Diagnostic>) {
    for cu in &program.comp_units {
        let file = files.get(cu.file);

        if cu.types.len() > 1 {
            for ty in &cu.types {
                errors.push(Diagnostic::new(
                    DiagnosticKind::MultipleTypesPerCompUnitError,
                    FileSpan::new(cu.file, ty.name_span),
                    "Joos does not support multiple types per file",
                ));
            }
            continue;
        }

        let Some(ty) = cu.types.first() else { continue };
        if &*ty.name == file.stem() {
            continue;
        }
        errors.push(Diagnostic::new(
            DiagnosticKind::IncorrectFileNameError,
            FileSpan::new(cu.file, ty.name_span),
            format!("must be in a file named {}.java", ty.name),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::parse_file;

    fn weed(path: &str, text: &str) -> Vec<Diagnostic> {
        let mut files = FileSet::new();
        let id = files.add(path, text.to_string()).unwrap();
        let (cu, parse_errors) = parse_file(id, text);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let program = Program { comp_units: vec![cu.unwrap()] };
        let mut errors = Vec::new();
        check(&files, &program, &mut errors);
        errors
    }

    #[test]
    fn matching_file_name_is_fine() {
        assert!(weed("A.java", "public class A {}").is_empty());
    }

    #[test]
    fn mismatched_file_name_is_an_error() {
        let errors = weed("B.java", "public class A {}");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::IncorrectFileNameError);
    }

    #[test]
    fn multiple_types_is_an_error_per_type() {
        let errors = weed("A.java", "public class A {} class C {}");
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.kind == DiagnosticKind::MultipleTypesPerCompUnitError));
    }
}
