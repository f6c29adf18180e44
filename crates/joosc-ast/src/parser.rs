//! Recursive-descent parser, one token of lookahead.
//!
//! Kept deliberately thin: it builds a tree, full stop. It does not check
//! modifier legality, single-type-per-file rules, or any other syntactic
//! post-condition — those are the weeder's job.

use std::rc::Rc;

use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan, Span};
use joosc_lexer::{Token, TokenKind};

use crate::ast::{
    BinOp, CompUnit, Expr, FieldDecl, ImportDecl, MemberDecl, MethodDecl, Modifier, ModifierList,
    Param, PrimitiveKind, QualifiedName, Stmt, Type, TypeDecl, TypeKind, UnaryOp,
};
use crate::ids::TypeId;

pub struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    file: FileId,
    text: &'a str,
    errors: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ()>;

impl<'a> Parser<'a> {
    pub fn new(file: FileId, text: &'a str, tokens: &'a [Token]) -> Self {
        Parser { tokens, pos: 0, file, text, errors: Vec::new() }
    }

    fn fspan(&self, span: Span) -> FileSpan {
        FileSpan::new(self.file, span)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn text_of(&self, span: Span) -> &'a str {
        span.slice(self.text)
    }

    fn advance(&mut self) -> Token {
        let t = *self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn eat(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) { Some(self.advance()) } else { None }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Token> {
        if let Some(t) = self.eat(kind) {
            Ok(t)
        } else {
            let span = self.peek().span;
            self.errors.push(Diagnostic::new(
                DiagnosticKind::ParseError,
                self.fspan(span),
                format!("expected {:?}, found {:?}", kind, self.peek_kind()),
            ));
            Err(())
        }
    }

    // ----- top level -----

    pub fn parse_comp_unit(mut self) -> (Option<Rc<CompUnit>>, Vec<Diagnostic>) {
        let result = self.comp_unit();
        (result.ok(), self.errors)
    }

    fn comp_unit(&mut self) -> PResult<Rc<CompUnit>> {
        let package = if self.check(TokenKind::Package) {
            self.advance();
            let name = self.qualified_name()?;
            self.expect(TokenKind::Semi)?;
            Some(name)
        } else {
            None
        };

        let mut imports = Vec::new();
        while self.check(TokenKind::Import) {
            imports.push(self.import_decl()?);
        }

        let mut types = Vec::new();
        while !self.check(TokenKind::Eof) {
            types.push(self.type_decl()?);
        }

        Ok(Rc::new(CompUnit { file: self.file, package, imports, types }))
    }

    fn import_decl(&mut self) -> PResult<ImportDecl> {
        self.expect(TokenKind::Import)?;
        let mut parts = Vec::new();
        let first = self.expect(TokenKind::Identifier)?;
        parts.push(Rc::from(self.text_of(first.span)));
        let mut is_wildcard = false;
        let mut span = first.span;
        while self.check(TokenKind::Dot) {
            self.advance();
            if self.eat(TokenKind::Star).is_some() {
                is_wildcard = true;
                break;
            }
            let seg = self.expect(TokenKind::Identifier)?;
            span = span.merge(seg.span);
            parts.push(Rc::from(self.text_of(seg.span)));
        }
        self.expect(TokenKind::Semi)?;
        Ok(ImportDecl { name: QualifiedName::new(parts, span), is_wildcard })
    }

    fn qualified_name(&mut self) -> PResult<QualifiedName> {
        let first = self.expect(TokenKind::Identifier)?;
        let mut span = first.span;
        let mut parts = vec![Rc::from(self.text_of(first.span))];
        while self.check(TokenKind::Dot) {
            self.advance();
            let seg = self.expect(TokenKind::Identifier)?;
            span = span.merge(seg.span);
            parts.push(Rc::from(self.text_of(seg.span)));
        }
        Ok(QualifiedName::new(parts, span))
    }

    // ----- declarations -----

    fn modifier_list(&mut self) -> ModifierList {
        let mut mods = ModifierList::new();
        loop {
            let m = match self.peek_kind() {
                TokenKind::Public => Modifier::Public,
                TokenKind::Protected => Modifier::Protected,
                TokenKind::Private => Modifier::Private,
                TokenKind::Abstract => Modifier::Abstract,
                TokenKind::Final => Modifier::Final,
                TokenKind::Static => Modifier::Static,
                TokenKind::Native => Modifier::Native,
                _ => break,
            };
            let tok = self.advance();
            if !mods.add(m, tok.span) {
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::ParseError,
                    self.fspan(tok.span),
                    "duplicate modifier",
                ));
            }
        }
        mods
    }

    fn type_decl(&mut self) -> PResult<Rc<TypeDecl>> {
        let mods = self.modifier_list();
        let kind = match self.peek_kind() {
            TokenKind::Class => {
                self.advance();
                TypeKind::Class
            }
            TokenKind::Interface => {
                self.advance();
                TypeKind::Interface
            }
            _ => {
                let span = self.peek().span;
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::ParseError,
                    self.fspan(span),
                    "expected 'class' or 'interface'",
                ));
                return Err(());
            }
        };

        let name_tok = self.expect(TokenKind::Identifier)?;
        let name: Rc<str> = Rc::from(self.text_of(name_tok.span));

        let mut extends = Vec::new();
        let mut implements = Vec::new();
        if self.eat(TokenKind::Extends).is_some() {
            extends.push(self.qualified_name()?);
            while self.eat(TokenKind::Comma).is_some() {
                extends.push(self.qualified_name()?);
            }
        }
        if self.eat(TokenKind::Implements).is_some() {
            implements.push(self.qualified_name()?);
            while self.eat(TokenKind::Comma).is_some() {
                implements.push(self.qualified_name()?);
            }
        }

        self.expect(TokenKind::LBrace)?;
        let mut members = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            members.push(self.member_decl(&name)?);
        }
        self.expect(TokenKind::RBrace)?;

        Ok(Rc::new(TypeDecl {
            mods,
            kind,
            name,
            name_span: name_tok.span,
            extends,
            implements,
            members,
            ty: TypeId::UNASSIGNED,
        }))
    }

    fn member_decl(&mut self, enclosing_name: &str) -> PResult<MemberDecl> {
        let mods = self.modifier_list();

        // Constructor: `Identifier(` matching the enclosing type's name.
        if self.check(TokenKind::Identifier)
            && self.text_of(self.peek().span) == enclosing_name
            && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::LParen)
        {
            let name_tok = self.advance();
            let name: Rc<str> = Rc::from(self.text_of(name_tok.span));
            let params = self.param_list()?;
            let body = self.block_stmt()?;
            return Ok(MemberDecl::Method(MethodDecl {
                mods,
                ret_ty: None,
                name,
                name_span: name_tok.span,
                params,
                body: Some(body),
            }));
        }

        let ty = if self.check(TokenKind::Void) {
            let tok = self.advance();
            Rc::new(Type::Void { span: tok.span })
        } else {
            self.parse_type()?
        };

        let name_tok = self.expect(TokenKind::Identifier)?;
        let name: Rc<str> = Rc::from(self.text_of(name_tok.span));

        if self.check(TokenKind::LParen) {
            let params = self.param_list()?;
            let body = if self.eat(TokenKind::Semi).is_some() {
                None
            } else {
                Some(self.block_stmt()?)
            };
            Ok(MemberDecl::Method(MethodDecl {
                mods,
                ret_ty: Some(ty),
                name,
                name_span: name_tok.span,
                params,
                body,
            }))
        } else {
            let init = if self.eat(TokenKind::Eq).is_some() { Some(self.expr()?) } else { None };
            self.expect(TokenKind::Semi)?;
            Ok(MemberDecl::Field(FieldDecl { mods, ty, name, name_span: name_tok.span, init }))
        }
    }

    fn param_list(&mut self) -> PResult<Vec<Param>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.check(TokenKind::RParen) {
            params.push(self.param()?);
            while self.eat(TokenKind::Comma).is_some() {
                params.push(self.param()?);
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn param(&mut self) -> PResult<Param> {
        let ty = self.parse_type()?;
        let name_tok = self.expect(TokenKind::Identifier)?;
        Ok(Param { ty, name: Rc::from(self.text_of(name_tok.span)), name_span: name_tok.span })
    }

    /// Parses a base type followed by zero or more `[]` suffixes.
    fn parse_type(&mut self) -> PResult<Rc<Type>> {
        let mut ty = self.parse_base_type()?;
        while self.check(TokenKind::LBracket)
            && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(TokenKind::RBracket)
        {
            let lbrack = self.advance();
            let rbrack = self.advance();
            ty = Rc::new(Type::Array { elem: ty, span: lbrack.span.merge(rbrack.span) });
        }
        Ok(ty)
    }

    fn parse_base_type(&mut self) -> PResult<Rc<Type>> {
        let kind = match self.peek_kind() {
            TokenKind::Boolean => PrimitiveKind::Boolean,
            TokenKind::Byte => PrimitiveKind::Byte,
            TokenKind::Short => PrimitiveKind::Short,
            TokenKind::Char => PrimitiveKind::Char,
            TokenKind::Int => PrimitiveKind::Int,
            TokenKind::Identifier => {
                let name = self.qualified_name()?;
                return Ok(Rc::new(Type::Reference { name }));
            }
            _ => {
                let span = self.peek().span;
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::ParseError,
                    self.fspan(span),
                    "expected a type",
                ));
                return Err(());
            }
        };
        let tok = self.advance();
        Ok(Rc::new(Type::Primitive { kind, span: tok.span }))
    }

    // ----- statements -----

    fn block_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let lbrace = self.expect(TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !self.check(TokenKind::RBrace) && !self.check(TokenKind::Eof) {
            stmts.push(self.stmt()?);
        }
        let rbrace = self.expect(TokenKind::RBrace)?;
        Ok(Rc::new(Stmt::Block { stmts, span: lbrace.span.merge(rbrace.span) }))
    }

    fn stmt(&mut self) -> PResult<Rc<Stmt>> {
        match self.peek_kind() {
            TokenKind::LBrace => self.block_stmt(),
            TokenKind::Semi => {
                let tok = self.advance();
                Ok(Rc::new(Stmt::Empty { span: tok.span }))
            }
            TokenKind::If => self.if_stmt(),
            TokenKind::While => self.while_stmt(),
            TokenKind::For => self.for_stmt(),
            TokenKind::Return => self.return_stmt(),
            _ if self.starts_local_decl() => self.local_decl_stmt(),
            _ => {
                let expr = self.expr()?;
                self.expect(TokenKind::Semi)?;
                Ok(Rc::new(Stmt::Expr { expr }))
            }
        }
    }

    /// A local declaration starts with a primitive keyword, or with an
    /// identifier that is followed (after an optional `[]`) by another
    /// identifier — distinguishing `Foo x = ...;` from the expression
    /// statement `Foo.bar();`.
    fn starts_local_decl(&self) -> bool {
        match self.peek_kind() {
            TokenKind::Boolean | TokenKind::Byte | TokenKind::Short | TokenKind::Char | TokenKind::Int => true,
            TokenKind::Identifier => {
                let mut i = self.pos + 1;
                while self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::Dot) {
                    if self.tokens.get(i + 1).map(|t| t.kind) != Some(TokenKind::Identifier) {
                        return false;
                    }
                    i += 2;
                }
                while self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::LBracket)
                    && self.tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::RBracket)
                {
                    i += 2;
                }
                self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::Identifier)
            }
            _ => false,
        }
    }

    fn local_decl_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let ty = self.parse_type()?;
        let name_tok = self.expect(TokenKind::Identifier)?;
        self.expect(TokenKind::Eq)?;
        let init = self.expr()?;
        self.expect(TokenKind::Semi)?;
        Ok(Rc::new(Stmt::LocalDecl {
            ty,
            name: Rc::from(self.text_of(name_tok.span)),
            name_span: name_tok.span,
            init,
        }))
    }

    fn if_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let if_tok = self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let then_branch = self.stmt()?;
        let else_branch = if self.eat(TokenKind::Else).is_some() { Some(self.stmt()?) } else { None };
        let span = if_tok.span.merge(then_branch.span_for_diagnostics());
        Ok(Rc::new(Stmt::If { cond, then_branch, else_branch, span }))
    }

    fn while_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let while_tok = self.expect(TokenKind::While)?;
        self.expect(TokenKind::LParen)?;
        let cond = self.expr()?;
        self.expect(TokenKind::RParen)?;
        let body = self.stmt()?;
        let span = while_tok.span.merge(body.span_for_diagnostics());
        Ok(Rc::new(Stmt::While { cond, body, span }))
    }

    fn for_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let for_tok = self.expect(TokenKind::For)?;
        self.expect(TokenKind::LParen)?;
        let init = if self.check(TokenKind::Semi) {
            None
        } else if self.starts_local_decl() {
            Some(self.local_decl_stmt()?)
        } else {
            let expr = self.expr()?;
            self.expect(TokenKind::Semi)?;
            Some(Rc::new(Stmt::Expr { expr }))
        };
        let cond = if self.check(TokenKind::Semi) { None } else { Some(self.expr()?) };
        self.expect(TokenKind::Semi)?;
        let update = if self.check(TokenKind::RParen) { None } else { Some(self.expr()?) };
        self.expect(TokenKind::RParen)?;
        let body = self.stmt()?;
        let span = for_tok.span.merge(body.span_for_diagnostics());
        Ok(Rc::new(Stmt::For { init, cond, update, body, span }))
    }

    fn return_stmt(&mut self) -> PResult<Rc<Stmt>> {
        let ret_tok = self.expect(TokenKind::Return)?;
        let value = if self.check(TokenKind::Semi) { None } else { Some(self.expr()?) };
        let semi = self.expect(TokenKind::Semi)?;
        Ok(Rc::new(Stmt::Return { span: ret_tok.span.merge(semi.span), value }))
    }

    // ----- expressions, lowest to highest precedence -----

    fn expr(&mut self) -> PResult<Rc<Expr>> {
        self.assignment_expr()
    }

    fn assignment_expr(&mut self) -> PResult<Rc<Expr>> {
        let lhs = self.or_expr()?;
        if self.check(TokenKind::Eq) {
            let op_tok = self.advance();
            let rhs = self.assignment_expr()?;
            return Ok(Rc::new(Expr::Bin {
                op: BinOp::Assign,
                op_span: op_tok.span,
                lhs,
                rhs,
                ty: TypeId::UNASSIGNED,
            }));
        }
        Ok(lhs)
    }

    fn or_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(Self::and_expr, &[(TokenKind::OrOr, BinOp::Or)])
    }

    fn and_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(Self::bitor_expr, &[(TokenKind::AndAnd, BinOp::And)])
    }

    fn bitor_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(Self::bitand_expr, &[(TokenKind::Pipe, BinOp::BitOr)])
    }

    fn bitand_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(Self::equality_expr, &[(TokenKind::Amp, BinOp::BitAnd)])
    }

    fn equality_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(
            Self::relational_expr,
            &[(TokenKind::EqEq, BinOp::Eq), (TokenKind::Ne, BinOp::Ne)],
        )
    }

    fn relational_expr(&mut self) -> PResult<Rc<Expr>> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Lt => BinOp::Lt,
                TokenKind::Le => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::Ge => BinOp::Ge,
                TokenKind::Instanceof => {
                    self.advance();
                    let check_ty = self.parse_type()?;
                    let span = lhs.span().merge(check_ty.span());
                    lhs = Rc::new(Expr::InstanceOf { lhs, check_ty, span, ty: TypeId::UNASSIGNED });
                    continue;
                }
                _ => break,
            };
            let op_tok = self.advance();
            let rhs = self.additive_expr()?;
            lhs = Rc::new(Expr::Bin { op, op_span: op_tok.span, lhs, rhs, ty: TypeId::UNASSIGNED });
        }
        Ok(lhs)
    }

    fn additive_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(
            Self::multiplicative_expr,
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
        )
    }

    fn multiplicative_expr(&mut self) -> PResult<Rc<Expr>> {
        self.left_assoc_bin(
            Self::unary_expr,
            &[(TokenKind::Star, BinOp::Mul), (TokenKind::Slash, BinOp::Div), (TokenKind::Percent, BinOp::Mod)],
        )
    }

    fn left_assoc_bin(
        &mut self,
        next: fn(&mut Self) -> PResult<Rc<Expr>>,
        ops: &[(TokenKind, BinOp)],
    ) -> PResult<Rc<Expr>> {
        let mut lhs = next(self)?;
        loop {
            let Some(&(_, op)) = ops.iter().find(|(k, _)| self.check(*k)) else { break };
            let op_tok = self.advance();
            let rhs = next(self)?;
            lhs = Rc::new(Expr::Bin { op, op_span: op_tok.span, lhs, rhs, ty: TypeId::UNASSIGNED });
        }
        Ok(lhs)
    }

    fn unary_expr(&mut self) -> PResult<Rc<Expr>> {
        match self.peek_kind() {
            TokenKind::Minus => {
                let tok = self.advance();
                let operand = self.unary_expr()?;
                Ok(Rc::new(Expr::Unary { op: UnaryOp::Neg, op_span: tok.span, operand, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::Not => {
                let tok = self.advance();
                let operand = self.unary_expr()?;
                Ok(Rc::new(Expr::Unary { op: UnaryOp::Not, op_span: tok.span, operand, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::LParen if self.looks_like_cast() => self.cast_expr(),
            _ => self.postfix_expr(),
        }
    }

    /// `(` Type `)` followed by something that can't be the start of a
    /// parenthesized expression distinguishes a cast from `(a + b)`: a
    /// primitive type always means a cast, and a reference type means a
    /// cast only when followed by a unary-expr starter (another `(`, an
    /// identifier, a literal, `this`, `new`, or `!`/`-`).
    fn looks_like_cast(&self) -> bool {
        let mut i = self.pos + 1;
        let is_primitive = matches!(
            self.tokens.get(i).map(|t| t.kind),
            Some(TokenKind::Boolean | TokenKind::Byte | TokenKind::Short | TokenKind::Char | TokenKind::Int)
        );
        if is_primitive {
            return true;
        }
        if self.tokens.get(i).map(|t| t.kind) != Some(TokenKind::Identifier) {
            return false;
        }
        i += 1;
        while self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::Dot) {
            if self.tokens.get(i + 1).map(|t| t.kind) != Some(TokenKind::Identifier) {
                return false;
            }
            i += 2;
        }
        let mut saw_array = false;
        while self.tokens.get(i).map(|t| t.kind) == Some(TokenKind::LBracket)
            && self.tokens.get(i + 1).map(|t| t.kind) == Some(TokenKind::RBracket)
        {
            saw_array = true;
            i += 2;
        }
        if self.tokens.get(i).map(|t| t.kind) != Some(TokenKind::RParen) {
            return false;
        }
        if saw_array {
            return true;
        }
        matches!(
            self.tokens.get(i + 1).map(|t| t.kind),
            Some(
                TokenKind::LParen
                    | TokenKind::Identifier
                    | TokenKind::IntegerLiteral
                    | TokenKind::CharLiteral
                    | TokenKind::StringLiteral
                    | TokenKind::This
                    | TokenKind::New
                    | TokenKind::Not
                    | TokenKind::True
                    | TokenKind::False
                    | TokenKind::Null
            )
        )
    }

    fn cast_expr(&mut self) -> PResult<Rc<Expr>> {
        let lparen = self.expect(TokenKind::LParen)?;
        let target = self.parse_type()?;
        self.expect(TokenKind::RParen)?;
        let operand = self.unary_expr()?;
        let span = lparen.span.merge(operand.span());
        Ok(Rc::new(Expr::Cast { target, operand, span, ty: TypeId::UNASSIGNED }))
    }

    fn postfix_expr(&mut self) -> PResult<Rc<Expr>> {
        let mut expr = self.primary_expr()?;
        loop {
            match self.peek_kind() {
                TokenKind::Dot => {
                    self.advance();
                    let name_tok = self.expect(TokenKind::Identifier)?;
                    let field_name: Rc<str> = Rc::from(self.text_of(name_tok.span));
                    expr = Rc::new(Expr::FieldDeref {
                        base: expr,
                        field_name,
                        field_span: name_tok.span,
                        ty: TypeId::UNASSIGNED,
                    });
                    if self.check(TokenKind::LParen) {
                        expr = self.call_tail(expr)?;
                    }
                }
                TokenKind::LBracket => {
                    let lbrack = self.advance();
                    let index = self.expr()?;
                    let rbrack = self.expect(TokenKind::RBracket)?;
                    let span = expr.span().merge(lbrack.span).merge(rbrack.span);
                    expr = Rc::new(Expr::ArrayIndex { base: expr, index, span, ty: TypeId::UNASSIGNED });
                }
                TokenKind::LParen => {
                    expr = self.call_tail(expr)?;
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn call_tail(&mut self, callee: Rc<Expr>) -> PResult<Rc<Expr>> {
        let lparen = self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            args.push(self.expr()?);
            while self.eat(TokenKind::Comma).is_some() {
                args.push(self.expr()?);
            }
        }
        let rparen = self.expect(TokenKind::RParen)?;
        let span = callee.span().merge(lparen.span).merge(rparen.span);
        Ok(Rc::new(Expr::Call { callee, args, span, ty: TypeId::UNASSIGNED }))
    }

    fn primary_expr(&mut self) -> PResult<Rc<Expr>> {
        match self.peek_kind() {
            TokenKind::IntegerLiteral => {
                let tok = self.advance();
                Ok(Rc::new(Expr::IntLit { text: Rc::from(self.text_of(tok.span)), span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::CharLiteral => {
                let tok = self.advance();
                Ok(Rc::new(Expr::CharLit { text: Rc::from(self.text_of(tok.span)), span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::StringLiteral => {
                let tok = self.advance();
                Ok(Rc::new(Expr::StringLit { text: Rc::from(self.text_of(tok.span)), span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::True => {
                let tok = self.advance();
                Ok(Rc::new(Expr::BoolLit { value: true, span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::False => {
                let tok = self.advance();
                Ok(Rc::new(Expr::BoolLit { value: false, span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::Null => {
                let tok = self.advance();
                Ok(Rc::new(Expr::NullLit { span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::This => {
                let tok = self.advance();
                Ok(Rc::new(Expr::This { span: tok.span, ty: TypeId::UNASSIGNED }))
            }
            TokenKind::LParen => {
                let lparen = self.expect(TokenKind::LParen)?;
                let inner = self.expr()?;
                let rparen = self.expect(TokenKind::RParen)?;
                Ok(Rc::new(Expr::Paren { inner, span: lparen.span.merge(rparen.span) }))
            }
            TokenKind::New => self.new_expr(),
            TokenKind::Identifier => {
                let name = self.qualified_name()?;
                Ok(Rc::new(Expr::Name { name, ty: TypeId::UNASSIGNED }))
            }
            _ => {
                let span = self.peek().span;
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::ParseError,
                    self.fspan(span),
                    format!("unexpected token {:?} in expression", self.peek_kind()),
                ));
                Err(())
            }
        }
    }

    fn new_expr(&mut self) -> PResult<Rc<Expr>> {
        let new_tok = self.expect(TokenKind::New)?;
        let base_ty = self.parse_base_type()?;
        if self.check(TokenKind::LBracket) {
            let lbrack = self.advance();
            let size = if self.check(TokenKind::RBracket) { None } else { Some(self.expr()?) };
            let rbrack = self.expect(TokenKind::RBracket)?;
            let span = new_tok.span.merge(lbrack.span).merge(rbrack.span);
            return Ok(Rc::new(Expr::NewArray { elem_ty: base_ty, size, span, ty: TypeId::UNASSIGNED }));
        }
        let lparen = self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(TokenKind::RParen) {
            args.push(self.expr()?);
            while self.eat(TokenKind::Comma).is_some() {
                args.push(self.expr()?);
            }
        }
        let rparen = self.expect(TokenKind::RParen)?;
        let span = new_tok.span.merge(lparen.span).merge(rparen.span);
        Ok(Rc::new(Expr::NewClass { class_ty: base_ty, args, span, ty: TypeId::UNASSIGNED }))
    }
}

impl Stmt {
    /// Best-effort span for stitching together a parent statement's span;
    /// not a substitute for `Expr::span`, which is exact.
    fn span_for_diagnostics(&self) -> Span {
        match self {
            Stmt::Empty { span }
            | Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::For { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. } => *span,
            Stmt::LocalDecl { name_span, .. } => *name_span,
            Stmt::Expr { expr } => expr.span(),
        }
    }
}

/// Lexes and parses one file's source text into a compilation unit.
pub fn parse_file(file: FileId, text: &str) -> (Option<Rc<CompUnit>>, Vec<Diagnostic>) {
    let (tokens, mut errors) = joosc_lexer::lex(file, text);
    let parser = Parser::new(file, text, &tokens);
    let (comp_unit, parse_errors) = parser.parse_comp_unit();
    errors.extend(parse_errors);
    (comp_unit, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(text: &str) -> Rc<CompUnit> {
        let (cu, errors) = parse_file(FileId(0), text);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors.iter().map(|e| &e.message).collect::<Vec<_>>());
        cu.expect("expected a parsed compilation unit")
    }

    #[test]
    fn parses_empty_class() {
        let cu = parse_ok("public class Foo {}");
        assert_eq!(cu.types.len(), 1);
        assert_eq!(&*cu.types[0].name, "Foo");
    }

    #[test]
    fn parses_field_and_method() {
        let cu = parse_ok(
            "public class Foo { public int x; public int bar(int y) { return x + y; } }",
        );
        let ty = &cu.types[0];
        assert_eq!(ty.members.len(), 2);
        assert!(matches!(ty.members[0], MemberDecl::Field(_)));
        assert!(matches!(ty.members[1], MemberDecl::Method(_)));
    }

    #[test]
    fn parses_constructor() {
        let cu = parse_ok("public class Foo { public Foo() { this.x = 1; } }");
        let MemberDecl::Method(m) = &cu.types[0].members[0] else { panic!("expected method") };
        assert!(m.is_constructor());
    }

    #[test]
    fn assignment_is_a_bin_expr() {
        let cu = parse_ok("class Foo { void bar() { int x = 0; x = 1; } }");
        let MemberDecl::Method(m) = &cu.types[0].members[0] else { panic!() };
        let Stmt::Block { stmts, .. } = m.body.as_ref().unwrap().as_ref() else { panic!() };
        let Stmt::Expr { expr } = stmts[1].as_ref() else { panic!("expected expr stmt") };
        assert!(matches!(expr.as_ref(), Expr::Bin { op: BinOp::Assign, .. }));
    }

    #[test]
    fn distinguishes_cast_from_parenthesized_expr() {
        let cu = parse_ok("class Foo { int bar(int x) { return (x + 1); } int baz() { return (int) 1; } }");
        assert_eq!(cu.types[0].members.len(), 2);
    }

    #[test]
    fn parses_array_type_and_new_array() {
        let cu = parse_ok("class Foo { int[] make() { return new int[10]; } }");
        let MemberDecl::Method(m) = &cu.types[0].members[0] else { panic!() };
        assert!(m.ret_ty.as_ref().unwrap().is_array());
    }

    #[test]
    fn parses_for_and_while_and_if() {
        parse_ok(
            "class Foo { void bar() { for (int i = 0; i < 10; i = i + 1) { } while (true) { } if (true) { } else { } } }",
        );
    }

    #[test]
    fn reports_error_on_malformed_input() {
        let (cu, errors) = parse_file(FileId(0), "public class {");
        assert!(cu.is_none());
        assert!(!errors.is_empty());
    }
}
