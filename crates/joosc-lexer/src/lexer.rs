//! State-machine tokenizer.
//!
//! Mirrors the staged dispatch of a hand-written scanner: a `Start` state
//! picks the next lexeme class by its first byte, then a dedicated scan
//! function consumes it to completion. Whitespace and comments are
//! recognized but dropped rather than returned as tokens, since nothing
//! downstream of the lexer needs them.

use joosc_common::diagnostics::{Diagnostic, DiagnosticKind};
use joosc_common::span::{FileId, FileSpan, Span};

use crate::token::{Token, TokenKind, keyword_kind};

pub struct Lexer<'a> {
    text: &'a [u8],
    file: FileId,
    pos: u32,
    tokens: Vec<Token>,
    errors: Vec<Diagnostic>,
}

const MAX_OCTAL_ESCAPE: u32 = 0o377;

impl<'a> Lexer<'a> {
    pub fn new(file: FileId, text: &'a str) -> Self {
        Lexer { text: text.as_bytes(), file, pos: 0, tokens: Vec::new(), errors: Vec::new() }
    }

    pub fn lex(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        while !self.at_end() {
            self.step();
        }
        self.tokens.push(Token::new(TokenKind::Eof, Span::at(self.pos)));
        (self.tokens, self.errors)
    }

    fn at_end(&self) -> bool {
        self.pos as usize >= self.text.len()
    }

    fn peek(&self) -> u8 {
        self.text[self.pos as usize]
    }

    fn peek_at(&self, offset: u32) -> Option<u8> {
        self.text.get((self.pos + offset) as usize).copied()
    }

    fn advance(&mut self) -> u8 {
        let b = self.peek();
        self.pos += 1;
        b
    }

    fn has_prefix(&self, s: &str) -> bool {
        self.text[self.pos as usize..].starts_with(s.as_bytes())
    }

    fn fspan(&self, span: Span) -> FileSpan {
        FileSpan::new(self.file, span)
    }

    fn step(&mut self) {
        let start = self.pos;
        let c = self.peek();

        if self.has_prefix("//") {
            self.line_comment();
        } else if self.has_prefix("/*") {
            self.block_comment(start);
        } else if c == b' ' || c == b'\n' || c == b'\r' || c == b'\t' {
            while !self.at_end() && matches!(self.peek(), b' ' | b'\n' | b'\r' | b'\t') {
                self.advance();
            }
        } else if c == b'\'' {
            self.char_literal(start);
        } else if c == b'"' {
            self.string_literal(start);
        } else if c.is_ascii_digit() {
            self.integer_literal(start);
        } else if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            self.identifier_or_keyword(start);
        } else if let Some((kind, len)) = self.match_symbol() {
            self.pos += len;
            self.tokens.push(Token::new(kind, Span::new(start, self.pos)));
        } else {
            self.advance();
            self.errors.push(Diagnostic::new(
                DiagnosticKind::InvalidCharacterError,
                self.fspan(Span::new(start, self.pos)),
                format!("unexpected character {:?}", c as char),
            ));
        }
    }

    /// Ordered so that multi-character operators are tried before their
    /// single-character prefixes (`==` before `=`, `&&` before `&`).
    fn match_symbol(&self) -> Option<(TokenKind, u32)> {
        use TokenKind::*;
        const SYMBOLS: &[(&str, TokenKind)] = &[
            ("<=", Le), (">=", Ge), ("==", EqEq), ("!=", Ne), ("&&", AndAnd), ("||", OrOr),
            ("=", Eq), ("<", Lt), (">", Gt), ("!", Not), ("+", Plus), ("-", Minus),
            ("*", Star), ("/", Slash), ("%", Percent), ("&", Amp), ("|", Pipe),
            ("(", LParen), (")", RParen), ("{", LBrace), ("}", RBrace),
            ("[", LBracket), ("]", RBracket), (";", Semi), (",", Comma), (".", Dot),
        ];
        for (text, kind) in SYMBOLS {
            if self.has_prefix(text) {
                return Some((*kind, text.len() as u32));
            }
        }
        None
    }

    fn line_comment(&mut self) {
        self.pos += 2;
        while !self.at_end() && self.peek() != b'\n' {
            self.advance();
        }
    }

    fn block_comment(&mut self, start: u32) {
        self.pos += 2;
        let mut prev_star = false;
        loop {
            if self.at_end() {
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::InvalidCharacterError,
                    self.fspan(Span::new(start, self.pos)),
                    "unterminated block comment",
                ));
                return;
            }
            let next = self.advance();
            if prev_star && next == b'/' {
                return;
            }
            prev_star = next == b'*';
        }
    }

    fn identifier_or_keyword(&mut self, start: u32) {
        while !self.at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == b'_' || self.peek() == b'$') {
            self.advance();
        }
        let span = Span::new(start, self.pos);
        let text = std::str::from_utf8(&self.text[start as usize..self.pos as usize]).unwrap();
        let kind = keyword_kind(text).unwrap_or(TokenKind::Identifier);
        self.tokens.push(Token::new(kind, span));
    }

    /// A leading `0` followed by further digits is rejected at lex time,
    /// matching the no-octal-literal rule: `0` alone is fine, `01` is not.
    fn integer_literal(&mut self, start: u32) {
        let leading_zero = self.peek() == b'0';
        self.advance();
        let mut extra_digits = false;
        while !self.at_end() && self.peek().is_ascii_digit() {
            extra_digits = true;
            self.advance();
        }
        let span = Span::new(start, self.pos);
        if leading_zero && extra_digits {
            self.errors.push(Diagnostic::new(
                DiagnosticKind::InvalidIntRangeError,
                self.fspan(span),
                "integer literal may not have a leading zero",
            ));
        }
        self.tokens.push(Token::new(TokenKind::IntegerLiteral, span));
    }

    /// Consumes a backslash escape. `octal` escapes take up to three octal
    /// digits and stop early if a further digit would push the value past
    /// `0o377` (255), matching the one-byte range an escape can encode.
    fn advance_escape(&mut self, start: u32) -> bool {
        self.advance(); // past the backslash
        if self.at_end() {
            return false;
        }
        let first = self.peek();
        match first {
            b'b' | b't' | b'n' | b'f' | b'r' | b'\'' | b'"' | b'\\' => {
                self.advance();
                true
            }
            b'0'..=b'7' => {
                let mut value = 0u32;
                for _ in 0..3 {
                    let Some(d) = self.peek_opt_octal() else { break };
                    let candidate = value * 8 + d;
                    if candidate > MAX_OCTAL_ESCAPE {
                        break;
                    }
                    value = candidate;
                    self.advance();
                }
                let _ = start;
                true
            }
            _ => false,
        }
    }

    fn peek_opt_octal(&self) -> Option<u32> {
        if self.at_end() {
            return None;
        }
        let c = self.peek();
        if (b'0'..=b'7').contains(&c) { Some((c - b'0') as u32) } else { None }
    }

    fn char_literal(&mut self, start: u32) {
        self.advance(); // opening quote
        if self.at_end() {
            self.unterminated(start, "character literal");
            return;
        }
        if self.peek() == b'\\' {
            if !self.advance_escape(start) {
                self.errors.push(Diagnostic::new(
                    DiagnosticKind::InvalidCharacterError,
                    self.fspan(Span::new(start, self.pos)),
                    "invalid escape sequence in character literal",
                ));
            }
        } else if self.peek() == b'\'' || self.peek() == b'\n' {
            self.errors.push(Diagnostic::new(
                DiagnosticKind::InvalidCharacterError,
                self.fspan(Span::new(start, self.pos)),
                "empty or malformed character literal",
            ));
        } else {
            self.advance();
        }
        if self.at_end() || self.peek() != b'\'' {
            self.unterminated(start, "character literal");
            return;
        }
        self.advance();
        self.tokens.push(Token::new(TokenKind::CharLiteral, Span::new(start, self.pos)));
    }

    fn string_literal(&mut self, start: u32) {
        self.advance(); // opening quote
        loop {
            if self.at_end() {
                self.unterminated(start, "string literal");
                return;
            }
            let next = self.peek();
            if next == b'\n' {
                self.unterminated(start, "string literal");
                return;
            } else if next == b'"' {
                self.advance();
                break;
            } else if next == b'\\' {
                if !self.advance_escape(start) {
                    self.errors.push(Diagnostic::new(
                        DiagnosticKind::InvalidCharacterError,
                        self.fspan(Span::new(start, self.pos)),
                        "invalid escape sequence in string literal",
                    ));
                }
            } else {
                self.advance();
            }
        }
        self.tokens.push(Token::new(TokenKind::StringLiteral, Span::new(start, self.pos)));
    }

    fn unterminated(&mut self, start: u32, what: &str) {
        self.errors.push(Diagnostic::new(
            DiagnosticKind::InvalidCharacterError,
            self.fspan(Span::new(start, self.pos)),
            format!("unterminated {what}"),
        ));
    }
}

/// Tokenize one file's source text. The caller is responsible for having
/// already rejected non-ASCII input via [`joosc_common::files::FileSet::add`].
pub fn lex(file: FileId, text: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    Lexer::new(file, text).lex()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let (tokens, errors) = lex(FileId(0), text);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors.iter().map(|e| &e.message).collect::<Vec<_>>());
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn skips_whitespace_and_comments() {
        let ks = kinds("  // comment\n/* block */ class");
        assert_eq!(ks, vec![TokenKind::Class, TokenKind::Eof]);
    }

    #[test]
    fn distinguishes_keywords_from_identifiers() {
        let ks = kinds("class Foo extends Bar");
        assert_eq!(
            ks,
            vec![
                TokenKind::Class,
                TokenKind::Identifier,
                TokenKind::Extends,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn multi_char_operators_win_over_prefixes() {
        let ks = kinds("a <= b && c");
        assert_eq!(
            ks,
            vec![
                TokenKind::Identifier,
                TokenKind::Le,
                TokenKind::Identifier,
                TokenKind::AndAnd,
                TokenKind::Identifier,
                TokenKind::Eof
            ]
        );
    }

    #[test]
    fn rejects_leading_zero_multi_digit_integer() {
        let (_, errors) = lex(FileId(0), "01");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, DiagnosticKind::InvalidIntRangeError);
    }

    #[test]
    fn zero_alone_is_fine() {
        let ks = kinds("0");
        assert_eq!(ks, vec![TokenKind::IntegerLiteral, TokenKind::Eof]);
    }

    #[test]
    fn string_literal_with_escape() {
        let ks = kinds(r#""a\nb""#);
        assert_eq!(ks, vec![TokenKind::StringLiteral, TokenKind::Eof]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let (_, errors) = lex(FileId(0), "\"abc");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn octal_escape_caps_at_377() {
        let (tokens, errors) = lex(FileId(0), r"'\377'");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::CharLiteral);
    }
}
