//! Lexical scope tracking for local variables and parameters within one
//! method body. Mirrors the binder's approach to ids: a flat live-name map
//! plus a stack recording how many names each scope added, so leaving a
//! scope is just truncating back to the recorded length.

use std::rc::Rc;

use joosc_ast::ids::{LocalVarId, TypeId};
use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::FileSpan;
use rustc_hash::FxHashMap;

#[derive(Clone, Debug)]
pub struct VariableInfo {
    pub tid: TypeId,
    pub name: Rc<str>,
    pub pos: FileSpan,
    pub vid: LocalVarId,
}

/// A stack of scopes over a single flat `name -> VariableInfo` map, plus a
/// "currently declaring" marker used to reject `int x = x;`.
pub struct SymbolTable {
    cur_symbols: FxHashMap<Rc<str>, VariableInfo>,
    cur_scope_len: u32,
    scopes: Vec<Rc<str>>,
    scope_lengths: Vec<u32>,
    next_var_id: u32,
    currently_declaring: LocalVarId,
}

impl SymbolTable {
    /// Starts a symbol table with `params` already bound in an outermost
    /// scope (a method's parameters live for the whole body, never leave
    /// scope on their own).
    pub fn new(params: Vec<VariableInfo>, errors: &mut Vec<Diagnostic>) -> Self {
        let mut table = SymbolTable {
            cur_symbols: FxHashMap::default(),
            cur_scope_len: 0,
            scopes: Vec::new(),
            scope_lengths: Vec::new(),
            next_var_id: LocalVarId::FIRST_VALID,
            currently_declaring: LocalVarId::UNASSIGNED,
        };
        table.enter_scope();
        for param in params {
            let vid = LocalVarId(table.next_var_id);
            table.next_var_id += 1;
            let var_info = VariableInfo { tid: param.tid, name: param.name.clone(), pos: param.pos, vid };
            if let Some(existing) = table.cur_symbols.insert(param.name.clone(), var_info) {
                errors.push(make_duplicate_var_decl_error(&param.name, param.pos, existing.pos));
            }
            table.scopes.push(param.name);
            table.cur_scope_len += 1;
        }
        table
    }

    pub fn enter_scope(&mut self) {
        self.scope_lengths.push(self.cur_scope_len);
        self.cur_scope_len = 0;
    }

    pub fn leave_scope(&mut self) {
        for _ in 0..self.cur_scope_len {
            let name = self.scopes.pop().expect("scope length tracked correctly");
            self.cur_symbols.remove(&name);
        }
        self.cur_scope_len = self.scope_lengths.pop().expect("leave_scope without matching enter_scope");
    }

    /// Starts declaring `name`; `resolve_local` calls for `name` made before
    /// `declare_local_end` are treated as a self-reference in the
    /// initializer and rejected.
    pub fn declare_local_start(&mut self, tid: TypeId, name: Rc<str>, pos: FileSpan, errors: &mut Vec<Diagnostic>) -> LocalVarId {
        if let Some(existing) = self.cur_symbols.get(&name) {
            errors.push(make_duplicate_var_decl_error(&name, pos, existing.pos));
            return existing.vid;
        }
        let vid = LocalVarId(self.next_var_id);
        self.next_var_id += 1;
        self.currently_declaring = vid;
        self.cur_symbols.insert(name.clone(), VariableInfo { tid, name: name.clone(), pos, vid });
        self.scopes.push(name);
        self.cur_scope_len += 1;
        vid
    }

    pub fn declare_local_end(&mut self) {
        self.currently_declaring = LocalVarId::UNASSIGNED;
    }

    /// Declares `name` all at once; used wherever the initializer doesn't
    /// need `name` itself in scope while it's being checked (fields,
    /// for-init) as opposed to `for (int x = x + 1;;)` style self-reference
    /// checks, which callers get by bracketing with `declare_local_start`/
    /// `declare_local_end` around checking the initializer first.
    pub fn declare_local(&mut self, tid: TypeId, name: Rc<str>, pos: FileSpan, errors: &mut Vec<Diagnostic>) -> LocalVarId {
        let vid = self.declare_local_start(tid, name, pos, errors);
        self.declare_local_end();
        vid
    }

    /// Resolves `name`, emitting `UndefinedReferenceError` if nothing binds
    /// it and `VariableInitializerSelfReferenceError` if it's the variable
    /// currently being declared.
    pub fn resolve_local(&self, name: &str, pos: FileSpan, errors: &mut Vec<Diagnostic>) -> Option<(TypeId, LocalVarId)> {
        let Some(var) = self.cur_symbols.get(name) else {
            errors.push(Diagnostic::new(
                DiagnosticKind::UndefinedReferenceError,
                pos,
                format!("undefined reference to '{name}'"),
            ));
            return None;
        };
        if self.currently_declaring == var.vid {
            errors.push(Diagnostic::new(
                DiagnosticKind::VariableInitializerSelfReferenceError,
                pos,
                "a variable cannot be used in its own initializer",
            ));
            return None;
        }
        Some((var.tid, var.vid))
    }

    /// Resolves `name` without emitting a diagnostic on failure, so a
    /// caller doing staged name resolution can fall through to the next
    /// stage (implicit field, then type name) silently.
    pub fn try_resolve_local(&self, name: &str) -> Option<(TypeId, LocalVarId)> {
        let var = self.cur_symbols.get(name)?;
        if self.currently_declaring == var.vid {
            return None;
        }
        Some((var.tid, var.vid))
    }
}

fn make_duplicate_var_decl_error(name: &str, pos: FileSpan, old_pos: FileSpan) -> Diagnostic {
    Diagnostic::new(
        DiagnosticKind::DuplicateVarDeclError,
        pos,
        format!("local variable '{name}' was declared multiple times"),
    )
    .with_note(old_pos, "also declared here")
}

/// Enters a scope on construction, leaves it on drop; pairs with
/// [`SymbolTable::enter_scope`]/[`SymbolTable::leave_scope`] the way the
/// binder's own constructs tie cleanup to a value's lifetime.
pub struct ScopeGuard<'a> {
    table: &'a mut SymbolTable,
}

impl<'a> ScopeGuard<'a> {
    pub fn new(table: &'a mut SymbolTable) -> Self {
        table.enter_scope();
        ScopeGuard { table }
    }

    pub fn table(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.table.leave_scope();
    }
}

/// Brackets a local declaration's own name around checking its initializer,
/// so `resolve_local` can tell "used before its declaration finished" apart
/// from "used after".
pub struct VarDeclGuard<'a> {
    table: &'a mut SymbolTable,
}

impl<'a> VarDeclGuard<'a> {
    pub fn new(table: &'a mut SymbolTable, tid: TypeId, name: Rc<str>, pos: FileSpan, errors: &mut Vec<Diagnostic>) -> (Self, LocalVarId) {
        let vid = table.declare_local_start(tid, name, pos, errors);
        (VarDeclGuard { table }, vid)
    }

    pub fn table(&mut self) -> &mut SymbolTable {
        self.table
    }
}

impl Drop for VarDeclGuard<'_> {
    fn drop(&mut self) {
        self.table.declare_local_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_common::span::{FileId, Span};

    fn pos(n: u32) -> FileSpan {
        FileSpan::new(FileId(0), Span::at(n))
    }

    #[test]
    fn resolves_a_parameter() {
        let mut errors = Vec::new();
        let table = SymbolTable::new(
            vec![VariableInfo { tid: TypeId::INT, name: Rc::from("x"), pos: pos(0), vid: LocalVarId::UNASSIGNED }],
            &mut errors,
        );
        assert!(errors.is_empty());
        let (tid, _vid) = table.resolve_local("x", pos(10), &mut errors).expect("x should resolve");
        assert_eq!(tid, TypeId::INT);
        assert!(errors.is_empty());
    }

    #[test]
    fn leaving_a_scope_removes_its_locals() {
        let mut errors = Vec::new();
        let mut table = SymbolTable::new(vec![], &mut errors);
        {
            let mut guard = ScopeGuard::new(&mut table);
            guard.table().declare_local(TypeId::INT, Rc::from("y"), pos(1), &mut errors);
            assert!(guard.table().try_resolve_local("y").is_some());
        }
        assert!(table.try_resolve_local("y").is_none());
    }

    #[test]
    fn self_reference_in_initializer_is_rejected() {
        let mut errors = Vec::new();
        let mut table = SymbolTable::new(vec![], &mut errors);
        let (_guard, _vid) = VarDeclGuard::new(&mut table, TypeId::INT, Rc::from("x"), pos(0), &mut errors);
        let result = table.resolve_local("x", pos(5), &mut errors);
        assert!(result.is_none());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::VariableInitializerSelfReferenceError);
    }

    #[test]
    fn duplicate_local_declaration_is_reported() {
        let mut errors = Vec::new();
        let mut table = SymbolTable::new(vec![], &mut errors);
        table.declare_local(TypeId::INT, Rc::from("x"), pos(0), &mut errors);
        table.declare_local(TypeId::BOOL, Rc::from("x"), pos(5), &mut errors);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::DuplicateVarDeclError);
    }
}
