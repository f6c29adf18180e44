//! Constant folding: wraps every compile-time-constant expression in an
//! [`Expr::Const`] carrying its folded value, so later passes (dataflow's
//! reachability analysis, IR generation's string table) can match on
//! `Expr::Const` instead of re-deriving "is this actually constant" from
//! scratch. Folding never fails a compile on its own — an expression that
//! isn't foldable (a non-constant operand, a division by a runtime-zero
//! divisor) is simply left unfolded, same as the original's behavior of
//! leaving integer division/modulo by a literal zero for codegen/runtime to
//! deal with rather than a compile error.

use std::rc::Rc;

use joosc_ast::ids::TypeId;
use joosc_ast::visitor::{rewrite_expr_default, Visitor};
use joosc_ast::{BinOp, Expr, Program, UnaryOp};
pub use joosc_common::interner::ConstStringMap;

/// Rewrites a checked program, wrapping every expression whose value is
/// known at compile time in `Expr::Const`. `string_tid` is the resolved
/// `TypeId` for `java.lang.String`, needed to recognize string-typed
/// operands for `+` concatenation and equality.
pub fn fold_program(checked: &Program, string_tid: TypeId, strings: &mut ConstStringMap) -> Program {
    let mut folder = ConstantFolder { string_tid, strings };
    folder.rewrite_program(checked)
}

struct ConstantFolder<'a> {
    string_tid: TypeId,
    strings: &'a mut ConstStringMap,
}

/// A folded value pulled out of a (possibly `Const`-wrapped) expression,
/// carrying enough to rebuild a literal `Expr` of the same kind.
enum Folded {
    Int(i64),
    Bool(bool),
    Str(Rc<str>),
}

impl ConstantFolder<'_> {
    fn as_const(&self, e: &Rc<Expr>) -> Option<(Folded, TypeId)> {
        let Expr::Const { inner, ty } = e.as_ref() else { return None };
        let folded = match inner.as_ref() {
            Expr::IntLit { text, .. } => Folded::Int(parse_int_literal(text)),
            Expr::BoolLit { value, .. } => Folded::Bool(*value),
            Expr::StringLit { text, .. } => Folded::Str(text.clone()),
            _ => return None,
        };
        Some((folded, *ty))
    }

    fn stringify(&mut self, value: &Folded, ty: TypeId) -> Rc<str> {
        match value {
            Folded::Str(s) => s.clone(),
            Folded::Int(n) => Rc::from(n.to_string().as_str()),
            Folded::Bool(b) => {
                let _ = ty;
                Rc::from(if *b { "true" } else { "false" })
            }
        }
    }

    fn const_int(n: i64, span: joosc_common::span::Span) -> Rc<Expr> {
        Rc::new(Expr::Const {
            inner: Rc::new(Expr::IntLit { text: Rc::from(n.to_string().as_str()), span, ty: TypeId::INT }),
            ty: TypeId::INT,
        })
    }

    fn const_bool(b: bool, span: joosc_common::span::Span) -> Rc<Expr> {
        Rc::new(Expr::Const {
            inner: Rc::new(Expr::BoolLit { value: b, span, ty: TypeId::BOOL }),
            ty: TypeId::BOOL,
        })
    }

    fn const_string(&mut self, s: Rc<str>, span: joosc_common::span::Span, ty: TypeId) -> Rc<Expr> {
        self.strings.intern(&s);
        Rc::new(Expr::Const { inner: Rc::new(Expr::StringLit { text: s, span, ty }), ty })
    }

    fn fold_bin(&mut self, rebuilt: &Rc<Expr>) -> Rc<Expr> {
        let Expr::Bin { op, lhs, rhs, ty, .. } = rebuilt.as_ref() else { return rebuilt.clone() };
        let Some((lval, lty)) = self.as_const(lhs) else { return rebuilt.clone() };
        let Some((rval, rty)) = self.as_const(rhs) else { return rebuilt.clone() };
        let span = rebuilt.span();

        match op {
            BinOp::Or | BinOp::And => {
                let (Folded::Bool(l), Folded::Bool(r)) = (&lval, &rval) else { return rebuilt.clone() };
                let result = match op {
                    BinOp::Or => *l || *r,
                    BinOp::And => *l && *r,
                    _ => unreachable!(),
                };
                Self::const_bool(result, span)
            }
            BinOp::Add if lty == self.string_tid || rty == self.string_tid => {
                let ls = self.stringify(&lval, lty);
                let rs = self.stringify(&rval, rty);
                let joined: Rc<str> = Rc::from(format!("{ls}{rs}").as_str());
                self.const_string(joined, span, self.string_tid)
            }
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let (Folded::Int(l), Folded::Int(r)) = (&lval, &rval) else { return rebuilt.clone() };
                let (l, r) = (*l, *r);
                let folded = match op {
                    BinOp::Add => Some(wrapping_i32(l).wrapping_add(wrapping_i32(r))),
                    BinOp::Sub => Some(wrapping_i32(l).wrapping_sub(wrapping_i32(r))),
                    BinOp::Mul => Some(wrapping_i32(l).wrapping_mul(wrapping_i32(r))),
                    BinOp::Div => {
                        if r == 0 {
                            None
                        } else {
                            Some(wrapping_i32(l).wrapping_div(wrapping_i32(r)))
                        }
                    }
                    BinOp::Mod => {
                        if r == 0 {
                            None
                        } else {
                            Some(wrapping_i32(l).wrapping_rem(wrapping_i32(r)))
                        }
                    }
                    _ => unreachable!(),
                };
                match folded {
                    Some(n) => Self::const_int(n as i64, span),
                    // Division/modulo by a literal zero is left unfolded; the
                    // divide-by-zero check that rejects it runs at codegen.
                    None => rebuilt.clone(),
                }
            }
            BinOp::Le | BinOp::Ge | BinOp::Lt | BinOp::Gt | BinOp::Eq | BinOp::Ne => {
                if lty == self.string_tid && rty == self.string_tid {
                    let (Folded::Str(l), Folded::Str(r)) = (&lval, &rval) else { return rebuilt.clone() };
                    let eq = l == r;
                    let result = match op {
                        BinOp::Eq => eq,
                        BinOp::Ne => !eq,
                        _ => return rebuilt.clone(),
                    };
                    return Self::const_bool(result, span);
                }
                let (Folded::Int(l), Folded::Int(r)) = (&lval, &rval) else { return rebuilt.clone() };
                let (l, r) = (*l, *r);
                let result = match op {
                    BinOp::Le => l <= r,
                    BinOp::Ge => l >= r,
                    BinOp::Lt => l < r,
                    BinOp::Gt => l > r,
                    BinOp::Eq => l == r,
                    BinOp::Ne => l != r,
                    _ => unreachable!(),
                };
                Self::const_bool(result, span)
            }
            _ => {
                let _ = ty;
                rebuilt.clone()
            }
        }
    }

    fn fold_unary(&mut self, rebuilt: &Rc<Expr>) -> Rc<Expr> {
        let Expr::Unary { op, operand, .. } = rebuilt.as_ref() else { return rebuilt.clone() };
        let Some((val, _)) = self.as_const(operand) else { return rebuilt.clone() };
        let span = rebuilt.span();
        match (op, val) {
            (UnaryOp::Neg, Folded::Int(n)) => Self::const_int(wrapping_i32(n).wrapping_neg() as i64, span),
            (UnaryOp::Not, Folded::Bool(b)) => Self::const_bool(!b, span),
            _ => rebuilt.clone(),
        }
    }

    fn fold_cast(&mut self, rebuilt: &Rc<Expr>) -> Rc<Expr> {
        let Expr::Cast { operand, ty, .. } = rebuilt.as_ref() else { return rebuilt.clone() };
        let cast_ty = *ty;
        let Some((val, operand_ty)) = self.as_const(operand) else { return rebuilt.clone() };
        let span = rebuilt.span();

        if cast_ty == operand_ty {
            return match val {
                Folded::Int(n) => Self::const_int(n, span),
                Folded::Bool(b) => Self::const_bool(b, span),
                Folded::Str(s) => self.const_string(s, span, cast_ty),
            };
        }
        if cast_ty.is_primitive() && cast_ty.is_numeric() {
            let Folded::Int(n) = val else { return rebuilt.clone() };
            let masked = if cast_ty == TypeId::SHORT {
                (n as i32) & 0x0000_FFFF
            } else if cast_ty == TypeId::BYTE || cast_ty == TypeId::CHAR {
                (n as i32) & 0x0000_00FF
            } else {
                n as i32
            };
            return Self::const_int(masked as i64, span);
        }
        if cast_ty == self.string_tid {
            let s = self.stringify(&val, operand_ty);
            return self.const_string(s, span, cast_ty);
        }
        rebuilt.clone()
    }
}

impl Visitor for ConstantFolder<'_> {
    fn rewrite_expr(&mut self, e: &Rc<Expr>) -> Rc<Expr> {
        let rebuilt = rewrite_expr_default(self, e);
        match rebuilt.as_ref() {
            Expr::IntLit { span, .. } => {
                let Expr::IntLit { text, .. } = rebuilt.as_ref() else { unreachable!() };
                Self::const_int(parse_int_literal(text), *span)
            }
            Expr::BoolLit { value, span, .. } => Self::const_bool(*value, *span),
            Expr::StringLit { text, span, ty, .. } => self.const_string(text.clone(), *span, *ty),
            Expr::Bin { .. } => self.fold_bin(&rebuilt),
            Expr::Unary { .. } => self.fold_unary(&rebuilt),
            Expr::Cast { .. } => self.fold_cast(&rebuilt),
            _ => rebuilt,
        }
    }
}

/// Joos int literals are always non-negative text (a leading `-` is a
/// separate unary expression); parsed as `u32` then reinterpreted as `i32`
/// so `2147483648` (only legal as the operand of unary minus) parses rather
/// than overflowing.
fn parse_int_literal(text: &str) -> i64 {
    let as_u32: u32 = text.parse().unwrap_or(0);
    as_u32 as i32 as i64
}

fn wrapping_i32(n: i64) -> i32 {
    n as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use joosc_common::span::Span;

    fn int_lit(n: i64) -> Rc<Expr> {
        Rc::new(Expr::IntLit { text: Rc::from(n.to_string().as_str()), span: Span::at(0), ty: TypeId::INT })
    }

    fn fold_expr(e: &Rc<Expr>, string_tid: TypeId, strings: &mut ConstStringMap) -> Rc<Expr> {
        let mut folder = ConstantFolder { string_tid, strings };
        folder.rewrite_expr(e)
    }

    #[test]
    fn folds_addition_of_two_literals() {
        let mut strings = ConstStringMap::new();
        let bin = Rc::new(Expr::Bin { op: BinOp::Add, op_span: Span::at(0), lhs: int_lit(1), rhs: int_lit(2), ty: TypeId::INT });
        let folded = fold_expr(&bin, TypeId::STRING, &mut strings);
        match folded.as_ref() {
            Expr::Const { inner, .. } => match inner.as_ref() {
                Expr::IntLit { text, .. } => assert_eq!(&**text, "3"),
                _ => panic!("expected IntLit"),
            },
            _ => panic!("expected Const"),
        }
    }

    #[test]
    fn division_by_literal_zero_is_left_unfolded() {
        let mut strings = ConstStringMap::new();
        let bin = Rc::new(Expr::Bin { op: BinOp::Div, op_span: Span::at(0), lhs: int_lit(5), rhs: int_lit(0), ty: TypeId::INT });
        let folded = fold_expr(&bin, TypeId::STRING, &mut strings);
        assert!(matches!(folded.as_ref(), Expr::Bin { .. }));
    }

    #[test]
    fn string_concatenation_interns_the_result() {
        let mut strings = ConstStringMap::new();
        let lhs = Rc::new(Expr::StringLit { text: Rc::from("a"), span: Span::at(0), ty: TypeId::STRING });
        let rhs = Rc::new(Expr::StringLit { text: Rc::from("b"), span: Span::at(0), ty: TypeId::STRING });
        let bin = Rc::new(Expr::Bin { op: BinOp::Add, op_span: Span::at(0), lhs, rhs, ty: TypeId::STRING });
        let folded = fold_expr(&bin, TypeId::STRING, &mut strings);
        match folded.as_ref() {
            Expr::Const { inner, .. } => match inner.as_ref() {
                Expr::StringLit { text, .. } => assert_eq!(&**text, "ab"),
                _ => panic!("expected StringLit"),
            },
            _ => panic!("expected Const"),
        }
        assert_eq!(strings.intern("ab"), strings.intern("ab"));
    }
}
