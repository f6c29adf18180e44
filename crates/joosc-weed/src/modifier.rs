//! Modifier legality per declaration kind.
//!
//! Class members: a method body is present if and only if the method is
//! neither `abstract` nor `native`; an abstract method can't be `static` or
//! `final`; a `static` method can't be `final`; a `native` method must be
//! `static`; no field can be `abstract`, `final`, or `native`; a class can't
//! be `protected`, `static`, or `native`, nor both `abstract` and `final`.
//!
//! Interface members: no fields; no constructors; a method can't be
//! `protected`, `static`, `final`, or `native`, must be `public`, and can't
//! have a body; an interface can't be `protected`, `static`, `final`, or
//! `native`.
//!
//! Every declaration (class, interface, field, non-constructor method) must
//! carry exactly one of `public`/`protected`, and never both.

use joosc_ast::{MemberDecl, Modifier, ModifierList, Program, TypeDecl, TypeKind};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan, Span};

struct Ctx<'a> {
    file: FileId,
    errors: &'a mut Vec<Diagnostic>,
}

impl Ctx<'_> {
    fn push(&mut self, kind: DiagnosticKind, span: Span, message: impl Into<String>) {
        self.errors.push(Diagnostic::new(kind, FileSpan::new(self.file, span), message));
    }

    fn verify_none_of(&mut self, mods: &ModifierList, disallowed: &[Modifier], kind: DiagnosticKind, what: &str) {
        for m in disallowed {
            if let Some(span) = mods.span_of(*m) {
                self.push(kind, span, format!("{what} cannot be {}", mod_name(*m)));
            }
        }
    }

    fn verify_one_of(&mut self, mods: &ModifierList, name_span: Span, oneof: &[Modifier], kind: DiagnosticKind, message: &str) {
        if oneof.iter().any(|m| mods.has(*m)) {
            return;
        }
        self.push(kind, name_span, message);
    }

    fn verify_no_conflicting_access(&mut self, mods: &ModifierList) {
        if mods.has(Modifier::Public) && mods.has(Modifier::Protected) {
            let pub_span = mods.span_of(Modifier::Public).unwrap();
            let prot_span = mods.span_of(Modifier::Protected).unwrap();
            self.push(DiagnosticKind::ConflictingAccessModError, pub_span, "a declaration cannot have conflicting access modifiers");
            self.push(DiagnosticKind::ConflictingAccessModError, prot_span, "a declaration cannot have conflicting access modifiers");
        }
    }
}

fn mod_name(m: Modifier) -> &'static str {
    match m {
        Modifier::Public => "public",
        Modifier::Protected => "protected",
        Modifier::Private => "private",
        Modifier::Abstract => "abstract",
        Modifier::Final => "final",
        Modifier::Static => "static",
        Modifier::Native => "native",
    }
}

fn check_class_member(ctx: &mut Ctx, member: &MemberDecl) {
    match member {
        MemberDecl::Field(f) => {
            ctx.verify_no_conflicting_access(&f.mods);
            ctx.verify_one_of(
                &f.mods,
                f.name_span,
                &[Modifier::Public, Modifier::Protected],
                DiagnosticKind::ClassMemberNoAccessModError,
                "a class member must be either public or protected",
            );
            ctx.verify_none_of(
                &f.mods,
                &[Modifier::Abstract, Modifier::Final, Modifier::Native],
                DiagnosticKind::ClassFieldModifierError,
                "a class field",
            );
        }
        MemberDecl::Method(m) => {
            ctx.verify_no_conflicting_access(&m.mods);
            ctx.verify_one_of(
                &m.mods,
                m.name_span,
                &[Modifier::Public, Modifier::Protected],
                DiagnosticKind::ClassMemberNoAccessModError,
                "a class member must be either public or protected",
            );

            let has_body = m.body.is_some();
            if !m.is_constructor() {
                if !has_body && !m.mods.has(Modifier::Abstract) && !m.mods.has(Modifier::Native) {
                    ctx.push(DiagnosticKind::ClassMethodEmptyError, m.name_span, "a method must be native or abstract to have an empty body");
                }
                if has_body && (m.mods.has(Modifier::Abstract) || m.mods.has(Modifier::Native)) {
                    ctx.push(DiagnosticKind::ClassMethodNotEmptyError, m.name_span, "a native or abstract method must not have a body");
                }
            } else {
                ctx.verify_none_of(
                    &m.mods,
                    &[Modifier::Abstract, Modifier::Static, Modifier::Final, Modifier::Native],
                    DiagnosticKind::ClassConstructorModifierError,
                    "a constructor",
                );
                if !has_body {
                    ctx.push(DiagnosticKind::ClassConstructorEmptyError, m.name_span, "a constructor cannot have an empty body");
                }
            }

            if !m.is_constructor() && m.mods.has(Modifier::Abstract) {
                ctx.verify_none_of(
                    &m.mods,
                    &[Modifier::Static, Modifier::Final],
                    DiagnosticKind::ClassMethodAbstractModifierError,
                    "an abstract method",
                );
            }
            if !m.is_constructor() && m.mods.has(Modifier::Static) && m.mods.has(Modifier::Final) {
                ctx.push(DiagnosticKind::ClassMethodStaticFinalError, m.mods.span_of(Modifier::Final).unwrap(), "a static method cannot be final");
            }
            if !m.is_constructor() && m.mods.has(Modifier::Native) && !m.mods.has(Modifier::Static) {
                ctx.push(DiagnosticKind::ClassMethodNativeNotStaticError, m.mods.span_of(Modifier::Native).unwrap(), "a native method must be static");
            }
        }
    }
}

fn check_interface_member(ctx: &mut Ctx, member: &MemberDecl) {
    match member {
        MemberDecl::Field(f) => {
            ctx.push(DiagnosticKind::InterfaceFieldError, f.name_span, "an interface cannot contain any fields");
        }
        MemberDecl::Method(m) => {
            if m.is_constructor() {
                ctx.push(DiagnosticKind::InterfaceMethodModifierError, m.name_span, "an interface cannot contain a constructor");
                return;
            }
            ctx.verify_none_of(
                &m.mods,
                &[Modifier::Protected, Modifier::Static, Modifier::Final, Modifier::Native],
                DiagnosticKind::InterfaceMethodModifierError,
                "an interface method",
            );
            ctx.verify_one_of(
                &m.mods,
                m.name_span,
                &[Modifier::Public],
                DiagnosticKind::InterfaceMethodNoAccessModError,
                "an interface member must be public",
            );
            if m.body.is_some() {
                ctx.push(DiagnosticKind::InterfaceMethodImplError, m.name_span, "an interface method cannot have a body");
            }
        }
    }
}

fn check_type_decl(ctx: &mut Ctx, decl: &TypeDecl) {
    match decl.kind {
        TypeKind::Class => {
            ctx.verify_none_of(
                &decl.mods,
                &[Modifier::Protected, Modifier::Static, Modifier::Native],
                DiagnosticKind::ClassModifierError,
                "a class",
            );
            ctx.verify_one_of(
                &decl.mods,
                decl.name_span,
                &[Modifier::Public],
                DiagnosticKind::ClassNoAccessModError,
                "a class must be public",
            );
            if decl.mods.has(Modifier::Abstract) && decl.mods.has(Modifier::Final) {
                ctx.push(DiagnosticKind::AbstractFinalClass, decl.name_span, "a class cannot be both abstract and final");
            }
            for member in &decl.members {
                check_class_member(ctx, member);
            }
        }
        TypeKind::Interface => {
            ctx.verify_none_of(
                &decl.mods,
                &[Modifier::Protected, Modifier::Static, Modifier::Final, Modifier::Native],
                DiagnosticKind::InterfaceModifierError,
                "an interface",
            );
            ctx.verify_one_of(
                &decl.mods,
                decl.name_span,
                &[Modifier::Public],
                DiagnosticKind::InterfaceNoAccessModError,
                "an interface must be public",
            );
            for member in &decl.members {
                check_interface_member(ctx, member);
            }
        }
    }
}

pub fn check(program: Program, errors: &mut Vec<Diagnostic>) -> Program {
    for cu in &program.comp_units {
        let mut ctx = Ctx { file: cu.file, errors };
        for ty in &cu.types {
            check_type_decl(&mut ctx, ty);
        }
    }
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_ast::parse_file;
    use joosc_common::span::FileId as Fid;

    fn weed(text: &str) -> Vec<Diagnostic> {
        let (cu, parse_errors) = parse_file(Fid(0), text);
        assert!(parse_errors.is_empty(), "{:?}", parse_errors);
        let program = Program { comp_units: vec![cu.unwrap()] };
        let mut errors = Vec::new();
        check(program, &mut errors);
        errors
    }

    #[test]
    fn well_formed_class_has_no_errors() {
        assert!(weed("public class A { public A() {} public void m() {} }").is_empty());
    }

    #[test]
    fn private_class_is_rejected() {
        let errors = weed("class A { public A() {} }");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::ClassNoAccessModError);
    }

    #[test]
    fn abstract_final_class_is_rejected() {
        let errors = weed("public abstract final class A { public A() {} }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::AbstractFinalClass));
    }

    #[test]
    fn native_non_static_method_is_rejected() {
        let errors = weed("public class A { public A() {} public native void m(); }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::ClassMethodNativeNotStaticError));
    }

    #[test]
    fn interface_field_is_rejected() {
        let errors = weed("public interface I { public int x; }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::InterfaceFieldError));
    }

    #[test]
    fn interface_method_with_body_is_rejected() {
        let errors = weed("public interface I { public void m() {} }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::InterfaceMethodImplError));
    }

    #[test]
    fn method_needing_abstract_or_native_for_empty_body_is_rejected() {
        let errors = weed("public class A { public A() {} public void m(); }");
        assert!(errors.iter().any(|e| e.kind == DiagnosticKind::ClassMethodEmptyError));
    }
}
