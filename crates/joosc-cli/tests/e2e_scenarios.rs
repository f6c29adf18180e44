use std::path::PathBuf;

use joosc_cli::args::Stage;
use joosc_cli::driver::{self, CompileOutcome};
use joosc_common::diagnostics::DiagnosticKind;
use joosc_ir::{Op, StreamKind, Value};

fn write_sources(files: &[(&str, &str)]) -> (tempfile::TempDir, Vec<PathBuf>) {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::with_capacity(files.len());
    for (name, text) in files {
        let path = dir.path().join(name);
        std::fs::write(&path, text).unwrap();
        paths.push(path);
    }
    (dir, paths)
}

fn compile(files: &[(&str, &str)], until: Stage) -> CompileOutcome {
    let (_dir, paths) = write_sources(files);
    driver::compile(&paths, until).expect("driver::compile should not hit an I/O/usage error")
}

fn kinds(outcome: &CompileOutcome) -> Vec<DiagnosticKind> {
    outcome.diagnostics.iter().map(|d| d.kind).collect()
}

// S1 — trivial program compiles clean, with `const(r, INT, 42); ret(r)` for `A.test`.
#[test]
fn s1_trivial_program_compiles_and_returns_the_constant() {
    let outcome = compile(
        &[("A.java", "public class A { public static int test() { return 42; } }")],
        Stage::GenIr,
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", kinds(&outcome));

    let ir = outcome.ir.expect("gen-ir stage should have produced IR");
    let user_unit = ir.units.last().expect("the user's own compilation unit is generated last");
    let test_method = user_unit
        .types
        .iter()
        .flat_map(|t| &t.streams)
        .find(|s| matches!(s.kind, StreamKind::Method(_)))
        .expect("A declares exactly one method stream");

    let const_dst = test_method.ops.iter().find_map(|op| match op {
        Op::Const { dst, value: Value::Int(42), .. } => Some(*dst),
        _ => None,
    });
    assert!(const_dst.is_some(), "expected a const(_, INT, 42), got {:?}", test_method.ops);
    assert!(
        test_method.ops.iter().any(|op| matches!(op, Op::Ret { value: Some(v) } if Some(*v) == const_dst)),
        "expected ret to return the same value the const produced"
    );
}

// S2 — a three-class extends cycle is exactly one ExtendsCycleError.
#[test]
fn s2_cyclic_inheritance_is_one_extends_cycle_error() {
    let outcome = compile(
        &[
            ("Foo.java", "class Foo extends Bar {}"),
            ("Bar.java", "class Bar extends Baz {}"),
            ("Baz.java", "class Baz extends Foo {}"),
        ],
        Stage::TypeCheck,
    );
    let kinds = kinds(&outcome);
    assert_eq!(kinds.iter().filter(|k| **k == DiagnosticKind::ExtendsCycleError).count(), 1, "{kinds:?}");
}

// S3 — overriding with an incompatible return type is a DifferingReturnTypeError.
#[test]
fn s3_override_with_a_different_return_type_is_rejected() {
    let outcome = compile(
        &[
            ("A.java", "public class A { public void foo() {} }"),
            ("B.java", "public class B extends A { public int foo() { return 1; } }"),
        ],
        Stage::TypeCheck,
    );
    assert!(kinds(&outcome).contains(&DiagnosticKind::DifferingReturnTypeError), "{:?}", kinds(&outcome));
}

// S4 — code after a return is unreachable, and doesn't also trip a needs-return error.
#[test]
fn s4_code_after_return_is_unreachable_and_not_missing_a_return() {
    let outcome = compile(
        &[("A.java", "public class A { public int f() { return 1; return 2; } }")],
        Stage::TypeCheck,
    );
    let kinds = kinds(&outcome);
    assert!(kinds.contains(&DiagnosticKind::UnreachableCodeError), "{kinds:?}");
    assert!(!kinds.contains(&DiagnosticKind::MethodNeedsReturnError), "{kinds:?}");
}

// S5 — a field initializer reading a field declared later is a forward reference.
#[test]
fn s5_field_forward_reference_is_a_field_order_error() {
    let outcome = compile(&[("A.java", "public class A { public int x = y; public int y = 1; }")], Stage::TypeCheck);
    assert!(kinds(&outcome).contains(&DiagnosticKind::FieldOrderError), "{:?}", kinds(&outcome));
}

// S6 — "a" + 1 + true folds to one interned "a1true" string constant.
#[test]
fn s6_string_concatenation_folds_into_one_interned_constant() {
    let outcome = compile(
        &[("A.java", "public class A { public static String test() { return \"a\" + 1 + true; } }")],
        Stage::GenIr,
    );
    assert!(outcome.diagnostics.is_empty(), "{:?}", kinds(&outcome));

    let strings = outcome.strings.expect("type-check stage produces a constant string map");
    let ir = outcome.ir.expect("gen-ir stage should have produced IR");
    let user_unit = ir.units.last().unwrap();
    let test_method = user_unit
        .types
        .iter()
        .flat_map(|t| &t.streams)
        .find(|s| matches!(s.kind, StreamKind::Method(_)))
        .unwrap();

    let returned_string_id = test_method.ops.iter().find_map(|op| match op {
        Op::Const { value: Value::Str(id), .. } => Some(*id),
        _ => None,
    });
    let id = returned_string_id.expect("the folded concatenation becomes one Const(Str) op");
    assert_eq!(strings.resolve(joosc_common::interner::StringId(id)), "a1true");
}
