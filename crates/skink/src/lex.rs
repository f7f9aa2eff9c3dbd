use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::Num;

use crate::{
    ast::{Comment, Span},
    intern::{Interner, Name},
    report::ErrorReporter,
};

/// Token kinds, payloads included.
///
/// `Div` and `RegExp` are produced from the same `/` character; which one the
/// lexer emits depends on the previous significant token (see
/// [`regex_allowed`]).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    BigInt(Rc<BigInt>),
    Str(Rc<str>),
    /// A regular expression literal: `(pattern, flags)`.
    RegExp(Rc<str>, Rc<str>),
    /// `` `chunk` `` with no substitutions.
    NoSubTemplate(Rc<str>),
    /// `` `chunk${ `` opening a substitution.
    TemplateHead(Rc<str>),
    /// `}chunk${` between substitutions.
    TemplateMiddle(Rc<str>),
    /// `` }chunk` `` closing the template.
    TemplateTail(Rc<str>),
    /// An identifier or contextual keyword (`of`, `get`, `set`); the parser
    /// decides which reading applies.
    Ident(Name),

    // Keywords
    Break,
    Case,
    Catch,
    Const,
    Continue,
    Debugger,
    Default,
    Delete,
    Do,
    Else,
    Finally,
    For,
    Function,
    If,
    In,
    Instanceof,
    Let,
    New,
    Null,
    Return,
    Switch,
    This,
    Throw,
    True,
    False,
    Try,
    Typeof,
    Var,
    Void,
    While,
    With,
    Yield,
    /// Reserved words we recognize but do not implement (`class`, `super`,
    /// `import`, `export`, `enum`). Using one is a syntax error with a
    /// better message than "unexpected token".
    Reserved(Name),

    // Punctuators
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    DotDotDot,
    Arrow,
    OptionalDot, // ?.
    Question,
    Colon,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Plus,
    Minus,
    Star,
    Div,
    Mod,
    StarStar,
    PlusPlus,
    MinusMinus,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Not,
    BitNot,
    AndAnd,
    OrOr,
    NullishCoalesce,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    DivAssign,
    ModAssign,
    StarStarAssign,
    ShlAssign,
    ShrAssign,
    UShrAssign,
    BitAndAssign,
    BitOrAssign,
    BitXorAssign,
    AndAndAssign,
    OrOrAssign,
    NullishAssign,

    Eof,
}

impl TokenKind {
    /// True for tokens after which a `/` must start a regex literal rather
    /// than a division.
    ///
    /// This is the lexer's single bit of parser context: a regex can follow
    /// any operator or punctuator (except the postfix forms and closers) and
    /// a handful of keywords that syntactically expect an operand.
    fn allows_regex_after(&self) -> bool {
        match self {
            // Value-ending tokens: a `/` after these is division.
            Self::Number(_)
            | Self::BigInt(_)
            | Self::Str(_)
            | Self::RegExp(..)
            | Self::NoSubTemplate(_)
            | Self::TemplateTail(_)
            | Self::Ident(_)
            | Self::This
            | Self::Null
            | Self::True
            | Self::False
            | Self::RParen
            | Self::RBracket
            | Self::PlusPlus
            | Self::MinusMinus => false,
            // `}` could end a block (regex allowed) or an object literal
            // (division). Blocks are overwhelmingly more common at statement
            // level, and that is the reading the original engine uses.
            Self::RBrace => true,
            // Keywords that expect an operand.
            Self::Return
            | Self::Typeof
            | Self::Delete
            | Self::In
            | Self::Instanceof
            | Self::New
            | Self::Throw
            | Self::Void
            | Self::Yield
            | Self::Case
            | Self::Do
            | Self::Else => true,
            // Everything else is an operator or opener.
            _ => true,
        }
    }
}

/// A single token with its source span.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte offset of the token start in the source.
    pub start: u32,
    /// Byte length of the token.
    pub len: u32,
    /// 1-based line number of the token start.
    pub line: u32,
    /// True when at least one line terminator separates this token from the
    /// previous one. The parser uses this for automatic semicolon insertion
    /// and the no-line-terminator restrictions; the lexer itself never
    /// inserts semicolons.
    pub newline_before: bool,
}

impl Token {
    fn eof(pos: u32, line: u32, newline_before: bool) -> Self {
        Self {
            kind: TokenKind::Eof,
            start: pos,
            len: 0,
            line,
            newline_before,
        }
    }
}

/// Hand-written scanner producing a lazy token sequence.
///
/// Template literals need help from the parser side: the scanner keeps a
/// stack of brace depths at which substitutions were opened, so a closing
/// `}` either resumes the template body or is an ordinary right brace.
#[derive(Clone)]
pub struct Lexer<'s> {
    src: &'s str,
    source_name: &'s str,
    pos: usize,
    line: u32,
    /// Byte offset where the current line starts, for column reporting.
    line_start: usize,
    /// Kind of the last significant token, for the regex-vs-division bit.
    prev: Option<TokenKind>,
    /// Current `{`-nesting depth outside templates.
    brace_depth: u32,
    /// Brace depths at which `${` substitutions were opened.
    template_stack: Vec<u32>,
    /// Whether legacy octal literals are rejected.
    strict: bool,
    /// Comments seen so far, in source order.
    comments: Vec<Comment>,
}

/// True when `/` should start a regex literal given the previous significant
/// token. At the very start of input a regex is allowed.
fn regex_allowed(prev: Option<&TokenKind>) -> bool {
    prev.map_or(true, TokenKind::allows_regex_after)
}

fn is_ident_start(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphabetic()
}

fn is_ident_part(c: char) -> bool {
    c == '$' || c == '_' || c.is_alphanumeric()
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

impl<'s> Lexer<'s> {
    pub fn new(src: &'s str, source_name: &'s str, strict: bool) -> Self {
        Self::with_first_line(src, source_name, strict, 1)
    }

    /// Like [`Lexer::new`] but starting the line counter at `first_line`,
    /// for sources embedded at a known position in a larger document.
    pub fn with_first_line(src: &'s str, source_name: &'s str, strict: bool, first_line: u32) -> Self {
        Self {
            src,
            source_name,
            pos: 0,
            line: first_line.max(1),
            line_start: 0,
            prev: None,
            brace_depth: 0,
            template_stack: Vec::new(),
            strict,
            comments: Vec::new(),
        }
    }

    /// Switches legacy-octal rejection on once a `"use strict"` directive is
    /// seen by the parser.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    /// Takes the comments recorded so far, sorted by position.
    pub fn take_comments(&mut self) -> Vec<Comment> {
        std::mem::take(&mut self.comments)
    }

    fn peek_char(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_char2(&self) -> Option<char> {
        let mut it = self.src[self.pos..].chars();
        it.next();
        it.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        if c == '\n' || c == '\u{2028}' || c == '\u{2029}' {
            self.line += 1;
            self.line_start = self.pos;
        } else if c == '\r' {
            // \r\n counts as one terminator
            if self.peek_char() == Some('\n') {
                self.pos += 1;
            }
            self.line += 1;
            self.line_start = self.pos;
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn column(&self, at: usize) -> u32 {
        (at.saturating_sub(self.line_start) + 1) as u32
    }

    fn current_line_source(&self) -> Option<&'s str> {
        let rest = &self.src[self.line_start..];
        let end = rest.find(is_line_terminator).unwrap_or(rest.len());
        Some(&rest[..end])
    }

    fn report(&self, reporter: &mut dyn ErrorReporter, at: usize, message: &str) {
        reporter.error(
            message,
            self.source_name,
            self.line,
            self.column(at),
            self.current_line_source(),
        );
    }

    /// Skips whitespace and comments, returning whether a line terminator was
    /// crossed.
    fn skip_trivia(&mut self, reporter: &mut dyn ErrorReporter) -> bool {
        let mut newline = false;
        loop {
            match self.peek_char() {
                Some(c) if is_line_terminator(c) => {
                    newline = true;
                    self.bump();
                }
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_char2() == Some('/') => {
                    let start = self.pos;
                    let line = self.line;
                    while let Some(c) = self.peek_char() {
                        if is_line_terminator(c) {
                            break;
                        }
                        self.bump();
                    }
                    self.comments.push(Comment {
                        span: Span::new(start as u32, (self.pos - start) as u32),
                        text: Rc::from(&self.src[start + 2..self.pos]),
                        line,
                        is_block: false,
                    });
                }
                Some('/') if self.peek_char2() == Some('*') => {
                    let start = self.pos;
                    let line = self.line;
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if is_line_terminator(c) {
                            newline = true;
                        }
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.report(reporter, start, "unterminated comment");
                    }
                    let text_end = if closed { self.pos - 2 } else { self.pos };
                    self.comments.push(Comment {
                        span: Span::new(start as u32, (self.pos - start) as u32),
                        text: Rc::from(&self.src[start + 2..text_end]),
                        line,
                        is_block: true,
                    });
                }
                _ => return newline,
            }
        }
    }

    /// Produces the next token. Lexical errors are reported and skipped so
    /// the stream stays useful for parser recovery.
    pub fn next_token(&mut self, interner: &mut Interner, reporter: &mut dyn ErrorReporter) -> Token {
        let newline_before = self.skip_trivia(reporter);
        let start = self.pos;
        let line = self.line;

        let Some(c) = self.peek_char() else {
            return Token::eof(start as u32, line, newline_before);
        };

        let kind = if is_ident_start(c) {
            self.lex_ident(interner)
        } else if c.is_ascii_digit() || (c == '.' && self.peek_char2().is_some_and(|d| d.is_ascii_digit())) {
            self.lex_number(reporter)
        } else if c == '"' || c == '\'' {
            self.lex_string(reporter)
        } else if c == '`' {
            self.bump();
            self.lex_template_chunk(reporter, true)
        } else {
            self.lex_punct(reporter)
        };

        match kind {
            Some(kind) => {
                self.prev = Some(kind.clone());
                Token {
                    kind,
                    start: start as u32,
                    len: (self.pos - start) as u32,
                    line,
                    newline_before,
                }
            }
            // The offending character was reported and consumed; resume with
            // the following one, preserving the newline flag.
            None => {
                let mut tok = self.next_token(interner, reporter);
                tok.newline_before |= newline_before;
                tok
            }
        }
    }

    fn lex_ident(&mut self, interner: &mut Interner) -> Option<TokenKind> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_ident_part(c) {
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.src[start..self.pos];
        Some(match text {
            "break" => TokenKind::Break,
            "case" => TokenKind::Case,
            "catch" => TokenKind::Catch,
            "const" => TokenKind::Const,
            "continue" => TokenKind::Continue,
            "debugger" => TokenKind::Debugger,
            "default" => TokenKind::Default,
            "delete" => TokenKind::Delete,
            "do" => TokenKind::Do,
            "else" => TokenKind::Else,
            "false" => TokenKind::False,
            "finally" => TokenKind::Finally,
            "for" => TokenKind::For,
            "function" => TokenKind::Function,
            "if" => TokenKind::If,
            "in" => TokenKind::In,
            "instanceof" => TokenKind::Instanceof,
            "let" => TokenKind::Let,
            "new" => TokenKind::New,
            "null" => TokenKind::Null,
            "return" => TokenKind::Return,
            "switch" => TokenKind::Switch,
            "this" => TokenKind::This,
            "throw" => TokenKind::Throw,
            "true" => TokenKind::True,
            "try" => TokenKind::Try,
            "typeof" => TokenKind::Typeof,
            "var" => TokenKind::Var,
            "void" => TokenKind::Void,
            "while" => TokenKind::While,
            "with" => TokenKind::With,
            "yield" => TokenKind::Yield,
            "class" | "super" | "import" | "export" | "enum" | "extends" => {
                TokenKind::Reserved(interner.intern(text))
            }
            _ => TokenKind::Ident(interner.intern(text)),
        })
    }

    fn lex_number(&mut self, reporter: &mut dyn ErrorReporter) -> Option<TokenKind> {
        let start = self.pos;
        let first = self.peek_char().unwrap_or('0');

        if first == '0' {
            match self.peek_char2() {
                Some('x' | 'X') => return self.lex_radix_number(reporter, 16),
                Some('o' | 'O') => return self.lex_radix_number(reporter, 8),
                Some('b' | 'B') => return self.lex_radix_number(reporter, 2),
                Some(d) if d.is_ascii_digit() => return self.lex_legacy_octal(reporter),
                _ => {}
            }
        }

        // Decimal: digits [. digits] [e[+-]digits] [n]
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let mut is_int = true;
        if self.peek_char() == Some('.') {
            is_int = false;
            self.bump();
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek_char(), Some('e' | 'E')) {
            is_int = false;
            self.bump();
            if matches!(self.peek_char(), Some('+' | '-')) {
                self.bump();
            }
            if !self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.report(reporter, self.pos, "missing exponent digits");
                return None;
            }
            while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        let text = &self.src[start..self.pos];
        if is_int && self.peek_char() == Some('n') {
            self.bump();
            let value = BigInt::from_str_radix(text, 10).ok()?;
            return Some(TokenKind::BigInt(Rc::new(value)));
        }
        match text.parse::<f64>() {
            Ok(value) => Some(TokenKind::Number(value)),
            Err(_) => {
                self.report(reporter, start, "invalid numeric literal");
                None
            }
        }
    }

    fn lex_radix_number(&mut self, reporter: &mut dyn ErrorReporter, radix: u32) -> Option<TokenKind> {
        let start = self.pos;
        self.bump(); // 0
        self.bump(); // x / o / b
        let digits_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_digit(radix)) {
            self.bump();
        }
        let digits = &self.src[digits_start..self.pos];
        if digits.is_empty() {
            self.report(reporter, start, "missing digits after radix prefix");
            return None;
        }
        if self.peek_char() == Some('n') {
            self.bump();
            let value = BigInt::from_str_radix(digits, radix).ok()?;
            return Some(TokenKind::BigInt(Rc::new(value)));
        }
        let mut value = 0f64;
        for c in digits.chars() {
            value = value * f64::from(radix) + f64::from(c.to_digit(radix).unwrap_or(0));
        }
        Some(TokenKind::Number(value))
    }

    /// Legacy `0755`-style octal, accepted in non-strict code. Digits 8 or 9
    /// demote the literal to decimal, matching Annex B behavior.
    fn lex_legacy_octal(&mut self, reporter: &mut dyn ErrorReporter) -> Option<TokenKind> {
        let start = self.pos;
        self.bump(); // leading 0
        let digits_start = self.pos;
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        let digits = &self.src[digits_start..self.pos];
        if self.strict {
            self.report(reporter, start, "legacy octal literals are not allowed in strict mode");
            return None;
        }
        let radix = if digits.bytes().any(|b| b == b'8' || b == b'9') {
            10
        } else {
            8
        };
        let mut value = 0f64;
        for c in digits.chars() {
            value = value * f64::from(radix) + f64::from(c.to_digit(10).unwrap_or(0));
        }
        Some(TokenKind::Number(value))
    }

    fn lex_string(&mut self, reporter: &mut dyn ErrorReporter) -> Option<TokenKind> {
        let quote = self.bump().unwrap_or('"');
        let mut out = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.report(reporter, self.pos, "unterminated string literal");
                    return None;
                }
                Some(c) if is_line_terminator(c) => {
                    self.report(reporter, self.pos, "unterminated string literal");
                    return None;
                }
                Some(c) if c == quote => {
                    self.bump();
                    return Some(TokenKind::Str(Rc::from(out)));
                }
                Some('\\') => {
                    self.bump();
                    if !self.lex_escape(&mut out, reporter) {
                        return None;
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    /// Decodes one escape sequence after a consumed backslash.
    fn lex_escape(&mut self, out: &mut String, reporter: &mut dyn ErrorReporter) -> bool {
        let at = self.pos;
        let Some(c) = self.bump() else {
            self.report(reporter, at, "unterminated escape sequence");
            return false;
        };
        match c {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' if !self.peek_char().is_some_and(|d| d.is_ascii_digit()) => out.push('\0'),
            'x' => {
                let Some(value) = self.lex_hex_digits(2) else {
                    self.report(reporter, at, "invalid \\x escape");
                    return false;
                };
                out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
            }
            'u' => {
                if self.eat('{') {
                    let digits_start = self.pos;
                    while self.peek_char().is_some_and(|d| d.is_ascii_hexdigit()) {
                        self.bump();
                    }
                    let digits = &self.src[digits_start..self.pos];
                    if digits.is_empty() || !self.eat('}') {
                        self.report(reporter, at, "invalid \\u{} escape");
                        return false;
                    }
                    match u32::from_str_radix(digits, 16).ok().and_then(char::from_u32) {
                        Some(ch) => out.push(ch),
                        None => {
                            self.report(reporter, at, "invalid code point in \\u{} escape");
                            return false;
                        }
                    }
                } else {
                    let Some(value) = self.lex_hex_digits(4) else {
                        self.report(reporter, at, "invalid \\u escape");
                        return false;
                    };
                    // Lone surrogates are preserved as the replacement char;
                    // the string type is UTF-8 backed.
                    out.push(char::from_u32(value).unwrap_or('\u{fffd}'));
                }
            }
            c if is_line_terminator(c) => {
                // Line continuation contributes nothing.
            }
            c => out.push(c),
        }
        true
    }

    fn lex_hex_digits(&mut self, count: usize) -> Option<u32> {
        let start = self.pos;
        for _ in 0..count {
            if !self.peek_char().is_some_and(|c| c.is_ascii_hexdigit()) {
                return None;
            }
            self.bump();
        }
        u32::from_str_radix(&self.src[start..self.pos], 16).ok()
    }

    /// Lexes a template chunk up to `` ` `` or `${`.
    ///
    /// `opening` is true when called right after the backtick, false when
    /// resuming after a substitution's closing brace.
    fn lex_template_chunk(&mut self, reporter: &mut dyn ErrorReporter, opening: bool) -> Option<TokenKind> {
        let mut out = String::new();
        loop {
            match self.peek_char() {
                None => {
                    self.report(reporter, self.pos, "unterminated template literal");
                    return None;
                }
                Some('`') => {
                    self.bump();
                    let text: Rc<str> = Rc::from(out);
                    return Some(if opening {
                        TokenKind::NoSubTemplate(text)
                    } else {
                        TokenKind::TemplateTail(text)
                    });
                }
                Some('$') if self.peek_char2() == Some('{') => {
                    self.bump();
                    self.bump();
                    self.template_stack.push(self.brace_depth);
                    let text: Rc<str> = Rc::from(out);
                    return Some(if opening {
                        TokenKind::TemplateHead(text)
                    } else {
                        TokenKind::TemplateMiddle(text)
                    });
                }
                Some('\\') => {
                    self.bump();
                    if !self.lex_escape(&mut out, reporter) {
                        return None;
                    }
                }
                Some(c) => {
                    out.push(c);
                    self.bump();
                }
            }
        }
    }

    fn lex_regex(&mut self, reporter: &mut dyn ErrorReporter) -> Option<TokenKind> {
        let start = self.pos;
        self.bump(); // /
        let body_start = self.pos;
        let mut in_class = false;
        loop {
            match self.peek_char() {
                None => {
                    self.report(reporter, start, "unterminated regular expression literal");
                    return None;
                }
                Some(c) if is_line_terminator(c) => {
                    self.report(reporter, start, "unterminated regular expression literal");
                    return None;
                }
                Some('\\') => {
                    self.bump();
                    self.bump();
                }
                Some('[') => {
                    in_class = true;
                    self.bump();
                }
                Some(']') => {
                    in_class = false;
                    self.bump();
                }
                Some('/') if !in_class => {
                    break;
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        let body = &self.src[body_start..self.pos];
        self.bump(); // closing /
        let flags_start = self.pos;
        while self.peek_char().is_some_and(is_ident_part) {
            self.bump();
        }
        let flags = &self.src[flags_start..self.pos];
        Some(TokenKind::RegExp(Rc::from(body), Rc::from(flags)))
    }

    fn lex_punct(&mut self, reporter: &mut dyn ErrorReporter) -> Option<TokenKind> {
        use TokenKind::*;
        let at = self.pos;
        let c = self.bump()?;
        Some(match c {
            '{' => {
                self.brace_depth += 1;
                LBrace
            }
            '}' => {
                if self.template_stack.last() == Some(&self.brace_depth) {
                    self.template_stack.pop();
                    return self.lex_template_chunk(reporter, false);
                }
                self.brace_depth = self.brace_depth.saturating_sub(1);
                RBrace
            }
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            ';' => Semi,
            ',' => Comma,
            ':' => Colon,
            '~' => BitNot,
            '.' => {
                if self.peek_char() == Some('.') && self.peek_char2() == Some('.') {
                    self.bump();
                    self.bump();
                    DotDotDot
                } else {
                    Dot
                }
            }
            '?' => {
                if self.peek_char() == Some('.') && !self.peek_char2().is_some_and(|d| d.is_ascii_digit()) {
                    self.bump();
                    OptionalDot
                } else if self.eat('?') {
                    if self.eat('=') { NullishAssign } else { NullishCoalesce }
                } else {
                    Question
                }
            }
            '<' => {
                if self.eat('<') {
                    if self.eat('=') { ShlAssign } else { Shl }
                } else if self.eat('=') {
                    Le
                } else {
                    Lt
                }
            }
            '>' => {
                if self.eat('>') {
                    if self.eat('>') {
                        if self.eat('=') { UShrAssign } else { UShr }
                    } else if self.eat('=') {
                        ShrAssign
                    } else {
                        Shr
                    }
                } else if self.eat('=') {
                    Ge
                } else {
                    Gt
                }
            }
            '=' => {
                if self.eat('=') {
                    if self.eat('=') { StrictEq } else { Eq }
                } else if self.eat('>') {
                    Arrow
                } else {
                    Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    if self.eat('=') { StrictNe } else { Ne }
                } else {
                    Not
                }
            }
            '+' => {
                if self.eat('+') {
                    PlusPlus
                } else if self.eat('=') {
                    PlusAssign
                } else {
                    Plus
                }
            }
            '-' => {
                if self.eat('-') {
                    MinusMinus
                } else if self.eat('=') {
                    MinusAssign
                } else {
                    Minus
                }
            }
            '*' => {
                if self.eat('*') {
                    if self.eat('=') { StarStarAssign } else { StarStar }
                } else if self.eat('=') {
                    StarAssign
                } else {
                    Star
                }
            }
            '%' => {
                if self.eat('=') { ModAssign } else { Mod }
            }
            '&' => {
                if self.eat('&') {
                    if self.eat('=') { AndAndAssign } else { AndAnd }
                } else if self.eat('=') {
                    BitAndAssign
                } else {
                    BitAnd
                }
            }
            '|' => {
                if self.eat('|') {
                    if self.eat('=') { OrOrAssign } else { OrOr }
                } else if self.eat('=') {
                    BitOrAssign
                } else {
                    BitOr
                }
            }
            '^' => {
                if self.eat('=') { BitXorAssign } else { BitXor }
            }
            '/' => {
                if regex_allowed(self.prev.as_ref()) {
                    self.pos = at;
                    return self.lex_regex(reporter);
                }
                if self.eat('=') { DivAssign } else { Div }
            }
            other => {
                self.report(reporter, at, &format!("illegal character '{other}'"));
                return None;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CollectingReporter;

    fn lex_all(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src, "test.js", false);
        let mut interner = Interner::new();
        let mut reporter = CollectingReporter::new();
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token(&mut interner, &mut reporter);
            if tok.kind == TokenKind::Eof {
                break;
            }
            out.push(tok.kind);
        }
        assert!(!reporter.has_errors(), "unexpected lex errors: {:?}", reporter.errors);
        out
    }

    #[test]
    fn division_vs_regex() {
        // After an identifier `/` is division.
        let toks = lex_all("a / b");
        assert!(matches!(toks[1], TokenKind::Div));

        // After `=` it starts a regex.
        let toks = lex_all("x = /ab+c/gi");
        match &toks[2] {
            TokenKind::RegExp(body, flags) => {
                assert_eq!(&**body, "ab+c");
                assert_eq!(&**flags, "gi");
            }
            other => panic!("expected regex, got {other:?}"),
        }

        // `return` expects an operand.
        let toks = lex_all("return /x/");
        assert!(matches!(toks[1], TokenKind::RegExp(..)));

        // A slash inside a character class does not terminate the literal.
        let toks = lex_all("x = /[/]/");
        assert!(matches!(toks[2], TokenKind::RegExp(..)));
    }

    #[test]
    fn newline_before_flag() {
        let mut lexer = Lexer::new("a\nb c", "test.js", false);
        let mut interner = Interner::new();
        let mut reporter = CollectingReporter::new();
        let a = lexer.next_token(&mut interner, &mut reporter);
        let b = lexer.next_token(&mut interner, &mut reporter);
        let c = lexer.next_token(&mut interner, &mut reporter);
        assert!(!a.newline_before);
        assert!(b.newline_before);
        assert!(!c.newline_before);
        assert_eq!(a.line, 1);
        assert_eq!(b.line, 2);
    }

    #[test]
    fn numeric_literals() {
        assert_eq!(lex_all("0xff"), vec![TokenKind::Number(255.0)]);
        assert_eq!(lex_all("0o17"), vec![TokenKind::Number(15.0)]);
        assert_eq!(lex_all("0b101"), vec![TokenKind::Number(5.0)]);
        assert_eq!(lex_all("1.5e2"), vec![TokenKind::Number(150.0)]);
        // Legacy octal in non-strict mode.
        assert_eq!(lex_all("0755"), vec![TokenKind::Number(493.0)]);
        // Digits 8/9 demote to decimal.
        assert_eq!(lex_all("078"), vec![TokenKind::Number(78.0)]);
        match &lex_all("123n")[0] {
            TokenKind::BigInt(v) => assert_eq!(v.to_string(), "123"),
            other => panic!("expected bigint, got {other:?}"),
        }
    }

    #[test]
    fn legacy_octal_rejected_in_strict_mode() {
        let mut lexer = Lexer::new("0755", "test.js", true);
        let mut interner = Interner::new();
        let mut reporter = CollectingReporter::new();
        let tok = lexer.next_token(&mut interner, &mut reporter);
        assert_eq!(tok.kind, TokenKind::Eof);
        assert!(reporter.has_errors());
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            lex_all(r#"'a\nb\x41B\u{1F600}'"#),
            vec![TokenKind::Str(Rc::from("a\nbAB\u{1F600}"))]
        );
    }

    #[test]
    fn template_modes() {
        let toks = lex_all("`a${x}b${y}c`");
        assert!(matches!(&toks[0], TokenKind::TemplateHead(s) if &**s == "a"));
        assert!(matches!(&toks[1], TokenKind::Ident(_)));
        assert!(matches!(&toks[2], TokenKind::TemplateMiddle(s) if &**s == "b"));
        assert!(matches!(&toks[4], TokenKind::TemplateTail(s) if &**s == "c"));

        // Nested braces inside a substitution stay ordinary braces.
        let toks = lex_all("`v=${ {a: 1}.a }!`");
        assert!(matches!(&toks[0], TokenKind::TemplateHead(_)));
        assert!(toks.iter().any(|t| matches!(t, TokenKind::LBrace)));
        assert!(matches!(toks.last().unwrap(), TokenKind::TemplateTail(s) if &**s == "!"));
    }

    #[test]
    fn error_recovery_continues_lexing() {
        let mut lexer = Lexer::new("a # b", "test.js", false);
        let mut interner = Interner::new();
        let mut reporter = CollectingReporter::new();
        let a = lexer.next_token(&mut interner, &mut reporter);
        let b = lexer.next_token(&mut interner, &mut reporter);
        assert!(matches!(a.kind, TokenKind::Ident(_)));
        assert!(matches!(b.kind, TokenKind::Ident(_)));
        assert_eq!(reporter.errors.len(), 1);
    }
}
