use joosc_ast::{parse_file, Program};
use joosc_common::diagnostics::DiagnosticKind;
use joosc_common::files::FileSet;

fn weed(path: &str, text: &str) -> Vec<DiagnosticKind> {
    let mut files = FileSet::new();
    let id = files.add(path, text.to_string()).unwrap();
    let (cu, parse_errors) = parse_file(id, text);
    assert!(parse_errors.is_empty(), "{:?}", parse_errors);
    let program = Program { comp_units: vec![cu.unwrap()] };
    let (_, errors) = joosc_weed::weed_program(&files, program);
    errors.into_iter().map(|e| e.kind).collect()
}

#[test]
fn clean_program_produces_no_diagnostics() {
    let kinds = weed(
        "Adder.java",
        "public class Adder { public int total; public Adder() { total = 0; } public int add(int x) { total = total + x; return total; } }",
    );
    assert!(kinds.is_empty(), "{:?}", kinds);
}

#[test]
fn accumulates_diagnostics_from_multiple_passes() {
    let kinds = weed(
        "Wrong.java",
        "class Broken { void m() { 1 + 1; } }",
    );
    assert!(kinds.contains(&DiagnosticKind::ClassNoAccessModError));
    assert!(kinds.contains(&DiagnosticKind::ClassMemberNoAccessModError));
    assert!(kinds.contains(&DiagnosticKind::IncorrectFileNameError));
    assert!(kinds.contains(&DiagnosticKind::InvalidTopLevelStatement));
}

#[test]
fn negated_int_min_survives_the_full_pipeline() {
    let kinds = weed(
        "Neg.java",
        "public class Neg { public int m() { return -2147483648; } }",
    );
    assert!(kinds.is_empty(), "{:?}", kinds);
}
