//! Recursive-descent parser.
//!
//! One token of lookahead, with an explicit context stack for the places the
//! grammar is context-sensitive: whether `return`, `break`, `continue` are
//! allowed, which labels are live, and whether `in` is an operator or the
//! `for…in` keyword. Automatic semicolon insertion happens here, driven by
//! the lexer's newline-before bit; the restricted productions (`return`,
//! `throw`, `break`, `continue`, postfix `++`/`--`) refuse an operand that
//! sits on the next line.
//!
//! On a syntax error the parser reports to the [`ErrorReporter`] and skips
//! ahead to the next statement boundary, so one pass surfaces as many
//! problems as possible.

use std::rc::Rc;

use crate::{
    ast::{
        AssignOp, AssignTarget, BinOp, Block, CatchClause, DeclKind, Declarator, Expr, ExprKind, ForHead, ForInit,
        FuncBody, FuncId, FunctionDef, LogicalOp, MemberKey, NameRef, Pattern, PatternKind, PropInit, PropName,
        ScopeInfo, ScriptAst, Span, Stmt, StmtKind, SwitchCase, UnaryOp, UpdateOp, VarDecl,
    },
    intern::{Interner, Name},
    lex::{Lexer, Token, TokenKind},
    report::ErrorReporter,
};

/// Parses `source` into a script AST.
///
/// Errors are reported through `reporter`; the returned AST covers whatever
/// could be salvaged. Callers that treat reported errors as fatal should
/// check the reporter afterwards.
pub fn parse(
    source: &str,
    source_name: &str,
    first_line: u32,
    strict: bool,
    reporter: &mut dyn ErrorReporter,
) -> ScriptAst {
    let mut interner = Interner::new();
    let mut parser = Parser::new(source, source_name, first_line, strict, &mut interner, reporter);
    parser.parse_program()
}

/// Reporter that swallows everything, used for speculative parses.
struct NullReporter;

impl ErrorReporter for NullReporter {
    fn warning(&mut self, _: &str, _: &str, _: u32, _: u32, _: Option<&str>) {}
    fn error(&mut self, _: &str, _: &str, _: u32, _: u32, _: Option<&str>) {}
}

/// A live label with whether it (transitively) labels a loop.
struct LabelEntry {
    name: Name,
    is_loop: bool,
}

struct Parser<'s, 'r> {
    lexer: Lexer<'s>,
    interner: &'r mut Interner,
    reporter: &'r mut dyn ErrorReporter,
    src: &'s str,
    source_name: &'s str,
    current: Token,
    /// End offset of the previously consumed token, for span closing.
    prev_end: u32,
    functions: Vec<FunctionDef>,
    strict: bool,
    function_depth: u32,
    loop_depth: u32,
    switch_depth: u32,
    labels: Vec<LabelEntry>,
}

impl<'s, 'r> Parser<'s, 'r> {
    fn new(
        src: &'s str,
        source_name: &'s str,
        first_line: u32,
        strict: bool,
        interner: &'r mut Interner,
        reporter: &'r mut dyn ErrorReporter,
    ) -> Self {
        let mut lexer = Lexer::with_first_line(src, source_name, strict, first_line);
        let current = lexer.next_token(interner, reporter);
        Self {
            lexer,
            interner,
            reporter,
            src,
            source_name,
            current,
            prev_end: 0,
            functions: Vec::new(),
            strict,
            function_depth: 0,
            loop_depth: 0,
            switch_depth: 0,
            labels: Vec::new(),
        }
    }

    // -- token plumbing ----------------------------------------------------

    fn advance(&mut self) -> Token {
        self.prev_end = self.current.start + self.current.len;
        let next = self.lexer.next_token(self.interner, self.reporter);
        std::mem::replace(&mut self.current, next)
    }

    fn at(&self, kind: &TokenKind) -> bool {
        &self.current.kind == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Peeks the token after the current one via a cloned lexer.
    fn peek_second(&self) -> TokenKind {
        let mut lexer = self.lexer.clone();
        let mut interner = Interner::new();
        let mut reporter = NullReporter;
        lexer.next_token(&mut interner, &mut reporter).kind
    }

    fn error_here(&mut self, message: &str) {
        let line = self.current.line;
        let column = self.column_of(self.current.start);
        let line_source = self.line_source_of(self.current.start);
        self.reporter
            .error(message, self.source_name, line, column, line_source.as_deref());
    }

    fn column_of(&self, offset: u32) -> u32 {
        let offset = offset as usize;
        let line_start = self.src[..offset.min(self.src.len())]
            .rfind('\n')
            .map_or(0, |i| i + 1);
        (offset - line_start + 1) as u32
    }

    fn line_source_of(&self, offset: u32) -> Option<String> {
        let offset = (offset as usize).min(self.src.len());
        let line_start = self.src[..offset].rfind('\n').map_or(0, |i| i + 1);
        let rest = &self.src[line_start..];
        let end = rest.find('\n').unwrap_or(rest.len());
        Some(rest[..end].to_owned())
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> bool {
        if self.eat(kind) {
            true
        } else {
            self.error_here(&format!("expected {what}"));
            false
        }
    }

    /// Consumes a statement terminator, inserting one where the grammar
    /// allows: before `}`, at end of input, or when the next token starts a
    /// new line.
    fn expect_semi(&mut self) {
        if self.eat(&TokenKind::Semi) {
            return;
        }
        if matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) || self.current.newline_before {
            return;
        }
        self.error_here("missing ; after statement");
        self.recover_to_statement_boundary();
    }

    /// Skips ahead to the next plausible statement start: past the next
    /// semicolon, or up to a closing brace, tracking bracket depth so
    /// boundaries inside nested expressions are not mistaken for statement
    /// boundaries.
    fn recover_to_statement_boundary(&mut self) {
        let mut depth = 0u32;
        loop {
            match &self.current.kind {
                TokenKind::Eof => return,
                TokenKind::Semi if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RParen | TokenKind::RBracket => {
                    depth = depth.saturating_sub(1);
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                    self.advance();
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.prev_end.saturating_sub(start))
    }

    // -- program -----------------------------------------------------------

    fn parse_program(&mut self) -> ScriptAst {
        let mut body = Vec::new();
        let mut directive_prologue = true;
        while !self.at(&TokenKind::Eof) {
            let before = (self.current.start, self.current.kind.clone());
            match self.parse_statement() {
                Some(stmt) => {
                    if directive_prologue {
                        if let Some(directive) = directive_of(&stmt) {
                            if &*directive == "use strict" {
                                self.strict = true;
                                self.lexer.set_strict(true);
                            }
                        } else {
                            directive_prologue = false;
                        }
                    }
                    body.push(stmt);
                }
                None => {
                    self.recover_to_statement_boundary();
                    // Ensure forward progress even when recovery stops at a
                    // token that also fails to start a statement.
                    if (self.current.start, self.current.kind.clone()) == before && !self.at(&TokenKind::Eof) {
                        self.advance();
                    }
                }
            }
        }
        let mut ast = ScriptAst {
            span: Span::new(0, self.src.len() as u32),
            body,
            scope: ScopeInfo::default(),
            functions: std::mem::take(&mut self.functions),
            global_vars: Vec::new(),
            global_fns: Vec::new(),
            comments: self.lexer.take_comments(),
            source_name: self.source_name.to_owned(),
            strict: self.strict,
        };
        ast.rebase_positions();
        ast
    }

    // -- statements --------------------------------------------------------

    fn parse_statement(&mut self) -> Option<Stmt> {
        let start = self.current.start;
        let line = self.current.line;
        let kind = match &self.current.kind {
            TokenKind::LBrace => {
                let block = self.parse_block()?;
                StmtKind::Block(block)
            }
            TokenKind::Semi => {
                self.advance();
                StmtKind::Empty
            }
            TokenKind::Var => self.parse_var_statement(DeclKind::Var)?,
            TokenKind::Let => self.parse_var_statement(DeclKind::Let)?,
            TokenKind::Const => self.parse_var_statement(DeclKind::Const)?,
            TokenKind::Function => {
                self.advance();
                let name = match &self.current.kind {
                    TokenKind::Ident(name) => {
                        let name = Rc::clone(name);
                        self.advance();
                        name
                    }
                    _ => {
                        self.error_here("function statement requires a name");
                        return None;
                    }
                };
                let func = self.parse_function_rest(Some(Rc::clone(&name)), false)?;
                StmtKind::FunctionDecl {
                    name: NameRef::new(name),
                    func,
                }
            }
            TokenKind::If => self.parse_if()?,
            TokenKind::While => self.parse_while()?,
            TokenKind::Do => self.parse_do_while()?,
            TokenKind::For => self.parse_for()?,
            TokenKind::Switch => self.parse_switch()?,
            TokenKind::Return => {
                self.advance();
                if self.function_depth == 0 {
                    self.error_here("return outside of function");
                }
                let arg = if matches!(self.current.kind, TokenKind::Semi | TokenKind::RBrace | TokenKind::Eof)
                    || self.current.newline_before
                {
                    None
                } else {
                    Some(self.parse_expression(false)?)
                };
                self.expect_semi();
                StmtKind::Return(arg)
            }
            TokenKind::Break => {
                self.advance();
                let label = self.parse_jump_label();
                match &label {
                    Some(name) => {
                        if !self.labels.iter().any(|l| l.name == *name) {
                            self.error_here(&format!("undefined label \"{name}\""));
                        }
                    }
                    None => {
                        if self.loop_depth == 0 && self.switch_depth == 0 {
                            self.error_here("break outside of loop or switch");
                        }
                    }
                }
                self.expect_semi();
                StmtKind::Break(label)
            }
            TokenKind::Continue => {
                self.advance();
                let label = self.parse_jump_label();
                match &label {
                    Some(name) => {
                        if !self.labels.iter().any(|l| l.name == *name && l.is_loop) {
                            self.error_here(&format!("continue target \"{name}\" is not a loop label"));
                        }
                    }
                    None => {
                        if self.loop_depth == 0 {
                            self.error_here("continue outside of loop");
                        }
                    }
                }
                self.expect_semi();
                StmtKind::Continue(label)
            }
            TokenKind::Throw => {
                self.advance();
                if self.current.newline_before {
                    self.error_here("no line break is allowed between throw and its expression");
                    return None;
                }
                let arg = self.parse_expression(false)?;
                self.expect_semi();
                StmtKind::Throw(arg)
            }
            TokenKind::Try => self.parse_try()?,
            TokenKind::With => self.parse_with()?,
            TokenKind::Debugger => {
                self.advance();
                self.expect_semi();
                StmtKind::Debugger
            }
            TokenKind::Reserved(word) => {
                let word = Rc::clone(word);
                self.error_here(&format!("\"{word}\" is reserved and not supported"));
                return None;
            }
            TokenKind::Ident(name) if matches!(self.peek_second(), TokenKind::Colon) => {
                let label = Rc::clone(name);
                self.advance(); // label
                self.advance(); // :
                if self.labels.iter().any(|l| l.name == label) {
                    self.error_here(&format!("duplicate label \"{label}\""));
                }
                let is_loop = self.peek_labels_loop();
                self.labels.push(LabelEntry {
                    name: Rc::clone(&label),
                    is_loop,
                });
                let body = self.parse_statement();
                self.labels.pop();
                StmtKind::Labeled {
                    label,
                    body: Box::new(body?),
                }
            }
            _ => {
                let expr = self.parse_expression(false)?;
                self.expect_semi();
                StmtKind::Expr(expr)
            }
        };
        Some(Stmt {
            span: self.span_from(start),
            line,
            kind,
        })
    }

    /// Whether the statement after zero or more further `label:` prefixes is
    /// a loop, looking ahead without consuming anything.
    fn peek_labels_loop(&self) -> bool {
        let mut lexer = self.lexer.clone();
        let mut interner = Interner::new();
        let mut reporter = NullReporter;
        let mut tok = self.current.kind.clone();
        loop {
            match tok {
                TokenKind::For | TokenKind::While | TokenKind::Do => return true,
                TokenKind::Ident(_) => {
                    let colon = lexer.next_token(&mut interner, &mut reporter).kind;
                    if colon != TokenKind::Colon {
                        return false;
                    }
                    tok = lexer.next_token(&mut interner, &mut reporter).kind;
                }
                _ => return false,
            }
        }
    }

    /// Label operand of `break`/`continue`; restricted production, so a
    /// label on the next line belongs to the following statement.
    fn parse_jump_label(&mut self) -> Option<Name> {
        match &self.current.kind {
            TokenKind::Ident(name) if !self.current.newline_before => {
                let name = Rc::clone(name);
                self.advance();
                Some(name)
            }
            _ => None,
        }
    }

    fn parse_block(&mut self) -> Option<Block> {
        self.expect(&TokenKind::LBrace, "{");
        let mut stmts = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => stmts.push(stmt),
                None => self.recover_to_statement_boundary(),
            }
        }
        self.expect(&TokenKind::RBrace, "}");
        Some(Block {
            stmts,
            scope: ScopeInfo::default(),
        })
    }

    fn parse_var_statement(&mut self, kind: DeclKind) -> Option<StmtKind> {
        self.advance();
        let decl = self.parse_var_decl(kind, true)?;
        self.expect_semi();
        Some(StmtKind::VarDecl(decl))
    }

    fn parse_var_decl(&mut self, kind: DeclKind, allow_in_operator: bool) -> Option<VarDecl> {
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_binding_target()?;
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment(!allow_in_operator)?)
            } else {
                if kind == DeclKind::Const {
                    self.error_here("missing initializer in const declaration");
                }
                if !matches!(pattern.kind, PatternKind::Ident(_)) {
                    self.error_here("destructuring declaration requires an initializer");
                }
                None
            };
            decls.push(Declarator { pattern, init });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        Some(VarDecl { kind, decls })
    }

    fn parse_if(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen, "( after if");
        let test = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen, ") after if condition");
        let then = Box::new(self.parse_statement()?);
        let otherwise = if self.eat(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Some(StmtKind::If { test, then, otherwise })
    }

    fn parse_while(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen, "( after while");
        let test = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen, ") after while condition");
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        Some(StmtKind::While {
            test,
            body: Box::new(body?),
        })
    }

    fn parse_do_while(&mut self) -> Option<StmtKind> {
        self.advance();
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        let body = body?;
        self.expect(&TokenKind::While, "while after do body");
        self.expect(&TokenKind::LParen, "( after do-while");
        let test = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen, ") after do-while condition");
        // The semicolon after do-while is optional even without a newline.
        self.eat(&TokenKind::Semi);
        Some(StmtKind::DoWhile {
            body: Box::new(body),
            test,
        })
    }

    /// Parses the three `for` forms. The head is disambiguated after the
    /// init clause: an `in` or `of` keyword turns the statement into
    /// enumeration, anything else continues as the classic form.
    fn parse_for(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen, "( after for");

        // Empty init: `for (;;)`
        if self.eat(&TokenKind::Semi) {
            return self.parse_classic_for_rest(None);
        }

        let decl_kind = match self.current.kind {
            TokenKind::Var => Some(DeclKind::Var),
            TokenKind::Let => Some(DeclKind::Let),
            TokenKind::Const => Some(DeclKind::Const),
            _ => None,
        };

        if let Some(kind) = decl_kind {
            self.advance();
            let first = self.parse_binding_target()?;
            if self.eat(&TokenKind::In) {
                let object = self.parse_expression(false)?;
                self.expect(&TokenKind::RParen, ") after for-in head");
                let body = self.parse_loop_body()?;
                return Some(StmtKind::ForIn {
                    left: ForHead::Decl(kind, first),
                    object,
                    body,
                    scope: ScopeInfo::default(),
                });
            }
            if self.eat_contextual("of") {
                let iterable = self.parse_assignment(false)?;
                self.expect(&TokenKind::RParen, ") after for-of head");
                let body = self.parse_loop_body()?;
                return Some(StmtKind::ForOf {
                    left: ForHead::Decl(kind, first),
                    iterable,
                    body,
                    scope: ScopeInfo::default(),
                });
            }
            // Classic for with declarations: finish the declarator list.
            let init = if self.eat(&TokenKind::Assign) {
                Some(self.parse_assignment(true)?)
            } else {
                None
            };
            let mut decls = vec![Declarator { pattern: first, init }];
            while self.eat(&TokenKind::Comma) {
                let pattern = self.parse_binding_element()?;
                let init = if self.eat(&TokenKind::Assign) {
                    Some(self.parse_assignment(true)?)
                } else {
                    None
                };
                decls.push(Declarator { pattern, init });
            }
            self.expect(&TokenKind::Semi, "; after for init");
            return self.parse_classic_for_rest(Some(ForInit::Decl(VarDecl { kind, decls })));
        }

        // Expression init.
        let init = self.parse_expression(true)?;
        if self.eat(&TokenKind::In) {
            let Some(target) = self.expr_to_pattern(&init) else {
                self.error_here("invalid left-hand side of for-in loop");
                return None;
            };
            let object = self.parse_expression(false)?;
            self.expect(&TokenKind::RParen, ") after for-in head");
            let body = self.parse_loop_body()?;
            return Some(StmtKind::ForIn {
                left: ForHead::Target(target),
                object,
                body,
                scope: ScopeInfo::default(),
            });
        }
        if self.eat_contextual("of") {
            let Some(target) = self.expr_to_pattern(&init) else {
                self.error_here("invalid left-hand side of for-of loop");
                return None;
            };
            let iterable = self.parse_assignment(false)?;
            self.expect(&TokenKind::RParen, ") after for-of head");
            let body = self.parse_loop_body()?;
            return Some(StmtKind::ForOf {
                left: ForHead::Target(target),
                iterable,
                body,
                scope: ScopeInfo::default(),
            });
        }
        self.expect(&TokenKind::Semi, "; after for init");
        self.parse_classic_for_rest(Some(ForInit::Expr(init)))
    }

    fn parse_classic_for_rest(&mut self, init: Option<ForInit>) -> Option<StmtKind> {
        let test = if self.at(&TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(&TokenKind::Semi, "; after for condition");
        let update = if self.at(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression(false)?)
        };
        self.expect(&TokenKind::RParen, ") after for head");
        let body = self.parse_loop_body()?;
        Some(StmtKind::For {
            init,
            test,
            update,
            body,
            scope: ScopeInfo::default(),
        })
    }

    fn parse_loop_body(&mut self) -> Option<Box<Stmt>> {
        self.loop_depth += 1;
        let body = self.parse_statement();
        self.loop_depth -= 1;
        Some(Box::new(body?))
    }

    fn parse_switch(&mut self) -> Option<StmtKind> {
        self.advance();
        self.expect(&TokenKind::LParen, "( after switch");
        let disc = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen, ") after switch discriminant");
        self.expect(&TokenKind::LBrace, "{ before switch body");
        let mut cases = Vec::new();
        let mut seen_default = false;
        self.switch_depth += 1;
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            let line = self.current.line;
            let test = if self.eat(&TokenKind::Case) {
                let test = self.parse_expression(false)?;
                Some(test)
            } else if self.eat(&TokenKind::Default) {
                if seen_default {
                    self.error_here("double default label in switch statement");
                }
                seen_default = true;
                None
            } else {
                self.error_here("expected case or default in switch body");
                self.switch_depth -= 1;
                return None;
            };
            self.expect(&TokenKind::Colon, ": after case label");
            let mut body = Vec::new();
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                match self.parse_statement() {
                    Some(stmt) => body.push(stmt),
                    None => self.recover_to_statement_boundary(),
                }
            }
            cases.push(SwitchCase { test, body, line });
        }
        self.switch_depth -= 1;
        self.expect(&TokenKind::RBrace, "} after switch body");
        Some(StmtKind::Switch {
            disc,
            cases,
            scope: ScopeInfo::default(),
        })
    }

    fn parse_try(&mut self) -> Option<StmtKind> {
        self.advance();
        let block = self.parse_block()?;
        let catch = if self.eat(&TokenKind::Catch) {
            let param = if self.eat(&TokenKind::LParen) {
                let pattern = self.parse_binding_target()?;
                self.expect(&TokenKind::RParen, ") after catch parameter");
                Some(pattern)
            } else {
                None
            };
            let body = self.parse_block()?;
            Some(CatchClause {
                param,
                body,
                scope: ScopeInfo::default(),
            })
        } else {
            None
        };
        let finally = if self.eat(&TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if catch.is_none() && finally.is_none() {
            self.error_here("missing catch or finally after try");
        }
        Some(StmtKind::Try { block, catch, finally })
    }

    fn parse_with(&mut self) -> Option<StmtKind> {
        self.advance();
        if self.strict {
            self.error_here("with statements are not allowed in strict mode");
        }
        self.expect(&TokenKind::LParen, "( after with");
        let object = self.parse_expression(false)?;
        self.expect(&TokenKind::RParen, ") after with object");
        let body = Box::new(self.parse_statement()?);
        Some(StmtKind::With { object, body })
    }

    fn eat_contextual(&mut self, word: &str) -> bool {
        if let TokenKind::Ident(name) = &self.current.kind {
            if &**name == word {
                self.advance();
                return true;
            }
        }
        false
    }

    // -- functions ---------------------------------------------------------

    /// Parses `(params) { body }` and registers the function, returning its
    /// id. The `function` keyword and name were already consumed.
    fn parse_function_rest(&mut self, name: Option<Name>, is_expression: bool) -> Option<FuncId> {
        let _ = is_expression;
        let start = self.current.start;
        let line = self.current.line;
        self.expect(&TokenKind::LParen, "( before function parameters");
        let (params, rest_param) = self.parse_param_list()?;
        let body = self.parse_function_body_block()?;
        Some(self.register_function(FunctionDef {
            span: Span::new(start, self.prev_end.saturating_sub(start)),
            line,
            name,
            params,
            rest_param,
            body: FuncBody::Block(body),
            scope: ScopeInfo::default(),
            hoisted_fns: Vec::new(),
            self_slot: None,
            is_arrow: false,
            strict: self.strict,
        }))
    }

    /// Parameter list after the opening paren; consumes the closing paren.
    fn parse_param_list(&mut self) -> Option<(Vec<Pattern>, Option<Box<Pattern>>)> {
        let mut params = Vec::new();
        let mut rest = None;
        if self.eat(&TokenKind::RParen) {
            return Some((params, rest));
        }
        loop {
            if self.eat(&TokenKind::DotDotDot) {
                rest = Some(Box::new(self.parse_binding_target()?));
                break;
            }
            params.push(self.parse_binding_element()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if self.at(&TokenKind::RParen) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, ") after function parameters");
        Some((params, rest))
    }

    /// Function body with directive-prologue handling; restores the previous
    /// strictness when the body ends.
    fn parse_function_body_block(&mut self) -> Option<Block> {
        self.expect(&TokenKind::LBrace, "{ before function body");
        let saved_strict = self.strict;
        let saved_labels = std::mem::take(&mut self.labels);
        let saved_loop = std::mem::replace(&mut self.loop_depth, 0);
        let saved_switch = std::mem::replace(&mut self.switch_depth, 0);
        self.function_depth += 1;

        let mut stmts = Vec::new();
        let mut directive_prologue = true;
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            match self.parse_statement() {
                Some(stmt) => {
                    if directive_prologue {
                        if let Some(directive) = directive_of(&stmt) {
                            if &*directive == "use strict" {
                                self.strict = true;
                                self.lexer.set_strict(true);
                            }
                        } else {
                            directive_prologue = false;
                        }
                    }
                    stmts.push(stmt);
                }
                None => self.recover_to_statement_boundary(),
            }
        }
        self.expect(&TokenKind::RBrace, "} after function body");

        self.function_depth -= 1;
        self.switch_depth = saved_switch;
        self.loop_depth = saved_loop;
        self.labels = saved_labels;
        self.strict = saved_strict;
        self.lexer.set_strict(saved_strict);
        Some(Block {
            stmts,
            scope: ScopeInfo::default(),
        })
    }

    fn register_function(&mut self, def: FunctionDef) -> FuncId {
        let id = self.functions.len() as FuncId;
        self.functions.push(def);
        id
    }

    /// Parses an arrow function given already-parsed parameters.
    fn parse_arrow_rest(
        &mut self,
        params: Vec<Pattern>,
        rest_param: Option<Box<Pattern>>,
        start: u32,
        line: u32,
    ) -> Option<Expr> {
        self.expect(&TokenKind::Arrow, "=>");
        let saved_strict = self.strict;
        let body = if self.at(&TokenKind::LBrace) {
            FuncBody::Block(self.parse_function_body_block()?)
        } else {
            self.function_depth += 1;
            let expr = self.parse_assignment(false);
            self.function_depth -= 1;
            FuncBody::Expr(Box::new(expr?))
        };
        self.strict = saved_strict;
        let func = self.register_function(FunctionDef {
            span: Span::new(start, self.prev_end.saturating_sub(start)),
            line,
            name: None,
            params,
            rest_param,
            body,
            scope: ScopeInfo::default(),
            hoisted_fns: Vec::new(),
            self_slot: None,
            is_arrow: true,
            strict: saved_strict,
        });
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Arrow(func),
        })
    }

    /// Decides whether a `(` starts an arrow parameter list by scanning
    /// ahead for the matching `)` followed by `=>` on the same line.
    fn paren_starts_arrow(&self) -> bool {
        debug_assert!(self.at(&TokenKind::LParen));
        let mut lexer = self.lexer.clone();
        let mut interner = Interner::new();
        let mut reporter = NullReporter;
        let mut depth = 1u32;
        loop {
            let tok = lexer.next_token(&mut interner, &mut reporter);
            match tok.kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    depth -= 1;
                    if depth == 0 {
                        let next = lexer.next_token(&mut interner, &mut reporter);
                        return next.kind == TokenKind::Arrow && !next.newline_before;
                    }
                }
                TokenKind::Eof => return false,
                _ => {}
            }
        }
    }

    // -- patterns ----------------------------------------------------------

    /// A bare binding target without a default: `x`, `[a, b]`, `{x: {y}}`.
    /// Used for declarator heads, where `=` introduces the initializer.
    fn parse_binding_target(&mut self) -> Option<Pattern> {
        let start = self.current.start;
        let line = self.current.line;
        let kind = match &self.current.kind {
            TokenKind::Ident(name) => {
                let name = Rc::clone(name);
                self.advance();
                PatternKind::Ident(NameRef::new(name))
            }
            TokenKind::LBracket => self.parse_array_pattern()?,
            TokenKind::LBrace => self.parse_object_pattern()?,
            _ => {
                self.error_here("expected a binding identifier or pattern");
                return None;
            }
        };
        Some(Pattern {
            span: self.span_from(start),
            line,
            kind,
            default: None,
        })
    }

    /// A binding pattern with optional default: `x`, `x = 1`, `[a, b] = c`.
    /// Used for parameters and destructuring elements.
    fn parse_binding_element(&mut self) -> Option<Pattern> {
        let mut pattern = self.parse_binding_target()?;
        if self.eat(&TokenKind::Assign) {
            let default = self.parse_assignment(false)?;
            pattern.span.len = self.prev_end.saturating_sub(pattern.span.pos);
            pattern.default = Some(Box::new(default));
        }
        Some(pattern)
    }

    fn parse_array_pattern(&mut self) -> Option<PatternKind> {
        self.expect(&TokenKind::LBracket, "[");
        let mut elements = Vec::new();
        let mut rest = None;
        loop {
            match &self.current.kind {
                TokenKind::RBracket => break,
                TokenKind::Comma => {
                    self.advance();
                    elements.push(None);
                    continue;
                }
                TokenKind::DotDotDot => {
                    self.advance();
                    rest = Some(Box::new(self.parse_binding_element()?));
                    break;
                }
                _ => {
                    elements.push(Some(self.parse_binding_element()?));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(&TokenKind::RBracket, "] after array pattern");
        Some(PatternKind::Array { elements, rest })
    }

    fn parse_object_pattern(&mut self) -> Option<PatternKind> {
        self.expect(&TokenKind::LBrace, "{");
        let mut props = Vec::new();
        let mut rest = None;
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            if self.eat(&TokenKind::DotDotDot) {
                rest = Some(Box::new(self.parse_binding_element()?));
                break;
            }
            let prop_start = self.current.start;
            let prop_line = self.current.line;
            let key = self.parse_prop_name()?;
            let value = if self.eat(&TokenKind::Colon) {
                self.parse_binding_element()?
            } else {
                // Shorthand, possibly with default.
                let name = match &key {
                    PropName::Ident(name) => Rc::clone(name),
                    _ => {
                        self.error_here("shorthand pattern property must be an identifier");
                        return None;
                    }
                };
                let default = if self.eat(&TokenKind::Assign) {
                    Some(Box::new(self.parse_assignment(false)?))
                } else {
                    None
                };
                Pattern {
                    span: self.span_from(prop_start),
                    line: prop_line,
                    kind: PatternKind::Ident(NameRef::new(name)),
                    default,
                }
            };
            props.push((key, value));
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "} after object pattern");
        Some(PatternKind::Object { props, rest })
    }

    fn parse_prop_name(&mut self) -> Option<PropName> {
        let kind = self.current.kind.clone();
        Some(match kind {
            TokenKind::Ident(name) => {
                self.advance();
                PropName::Ident(name)
            }
            TokenKind::Str(s) => {
                self.advance();
                PropName::Str(s)
            }
            TokenKind::Number(n) => {
                self.advance();
                PropName::Num(n)
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment(false)?;
                self.expect(&TokenKind::RBracket, "] after computed property name");
                PropName::Computed(Box::new(expr))
            }
            other => {
                // Keywords are valid property names.
                if let Some(text) = keyword_text(&other) {
                    self.advance();
                    PropName::Ident(self.interner.intern(text))
                } else {
                    self.error_here("invalid property name");
                    return None;
                }
            }
        })
    }

    /// Reinterprets an already-parsed expression as an assignment pattern,
    /// for destructuring assignment and `for…in`/`for…of` targets.
    fn expr_to_pattern(&mut self, expr: &Expr) -> Option<Pattern> {
        let kind = match &expr.kind {
            ExprKind::Ident(name_ref) => PatternKind::Ident(name_ref.clone()),
            ExprKind::Member {
                object,
                property,
                optional: false,
            } => PatternKind::Member {
                object: object.clone(),
                property: property.clone(),
            },
            ExprKind::Array(elements) => {
                let mut converted = Vec::new();
                let mut rest = None;
                for (index, element) in elements.iter().enumerate() {
                    match element {
                        None => converted.push(None),
                        Some(Expr {
                            kind: ExprKind::Spread(inner),
                            ..
                        }) => {
                            if index + 1 != elements.len() {
                                self.error_here("rest element must be last in a destructuring pattern");
                                return None;
                            }
                            rest = Some(Box::new(self.expr_to_pattern(inner)?));
                        }
                        Some(inner) => converted.push(Some(self.expr_to_pattern(inner)?)),
                    }
                }
                PatternKind::Array {
                    elements: converted,
                    rest,
                }
            }
            ExprKind::Object(props) => {
                let mut converted = Vec::new();
                let mut rest = None;
                for (index, prop) in props.iter().enumerate() {
                    match prop {
                        PropInit::KeyValue { key, value } => {
                            converted.push((key.clone(), self.expr_to_pattern(value)?));
                        }
                        PropInit::Shorthand(name_ref) => {
                            converted.push((
                                PropName::Ident(Rc::clone(&name_ref.name)),
                                Pattern {
                                    span: expr.span,
                                    line: expr.line,
                                    kind: PatternKind::Ident(name_ref.clone()),
                                    default: None,
                                },
                            ));
                        }
                        PropInit::Spread(inner) => {
                            if index + 1 != props.len() {
                                self.error_here("rest element must be last in a destructuring pattern");
                                return None;
                            }
                            rest = Some(Box::new(self.expr_to_pattern(inner)?));
                        }
                        _ => {
                            self.error_here("invalid destructuring assignment target");
                            return None;
                        }
                    }
                }
                PatternKind::Object { props: converted, rest }
            }
            // `a = 1` inside a pattern context carries the default value.
            ExprKind::Assign {
                op: AssignOp::Assign,
                target,
                value,
            } => {
                let mut pattern = self.assign_target_to_pattern(target, expr)?;
                pattern.default = Some(value.clone());
                return Some(pattern);
            }
            _ => {
                self.error_here("invalid assignment target");
                return None;
            }
        };
        Some(Pattern {
            span: expr.span,
            line: expr.line,
            kind,
            default: None,
        })
    }

    fn assign_target_to_pattern(&mut self, target: &AssignTarget, at: &Expr) -> Option<Pattern> {
        let kind = match target {
            AssignTarget::Ident(name_ref) => PatternKind::Ident(name_ref.clone()),
            AssignTarget::Member { object, property } => PatternKind::Member {
                object: object.clone(),
                property: property.clone(),
            },
            AssignTarget::Pattern(pattern) => return Some((**pattern).clone()),
        };
        Some(Pattern {
            span: at.span,
            line: at.line,
            kind,
            default: None,
        })
    }

    fn expr_to_assign_target(&mut self, expr: &Expr) -> Option<AssignTarget> {
        match &expr.kind {
            ExprKind::Ident(name_ref) => Some(AssignTarget::Ident(name_ref.clone())),
            ExprKind::Member {
                object,
                property,
                optional: false,
            } => Some(AssignTarget::Member {
                object: object.clone(),
                property: property.clone(),
            }),
            ExprKind::Array(_) | ExprKind::Object(_) => {
                let pattern = self.expr_to_pattern(expr)?;
                Some(AssignTarget::Pattern(Box::new(pattern)))
            }
            ExprKind::Member { optional: true, .. } | ExprKind::OptionalChain(_) => {
                self.error_here("invalid assignment to an optional chain");
                None
            }
            _ => {
                self.error_here("invalid assignment target");
                None
            }
        }
    }

    // -- expressions -------------------------------------------------------

    /// Full expression including the comma operator.
    fn parse_expression(&mut self, no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let first = self.parse_assignment(no_in)?;
        if !self.at(&TokenKind::Comma) {
            return Some(first);
        }
        let mut exprs = vec![first];
        while self.eat(&TokenKind::Comma) {
            exprs.push(self.parse_assignment(no_in)?);
        }
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Seq(exprs),
        })
    }

    fn parse_assignment(&mut self, no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;

        // Arrow functions first: `(params) => …` and `ident => …`.
        if self.at(&TokenKind::LParen) && self.paren_starts_arrow() {
            self.advance();
            let (params, rest_param) = self.parse_param_list()?;
            return self.parse_arrow_rest(params, rest_param, start, line);
        }
        if let TokenKind::Ident(name) = &self.current.kind {
            if self.peek_second() == TokenKind::Arrow {
                let name = Rc::clone(name);
                self.advance();
                let param = Pattern {
                    span: self.span_from(start),
                    line,
                    kind: PatternKind::Ident(NameRef::new(name)),
                    default: None,
                };
                return self.parse_arrow_rest(vec![param], None, start, line);
            }
        }

        let left = self.parse_conditional(no_in)?;

        let op = match self.current.kind {
            TokenKind::Assign => AssignOp::Assign,
            TokenKind::PlusAssign => AssignOp::Add,
            TokenKind::MinusAssign => AssignOp::Sub,
            TokenKind::StarAssign => AssignOp::Mul,
            TokenKind::DivAssign => AssignOp::Div,
            TokenKind::ModAssign => AssignOp::Mod,
            TokenKind::StarStarAssign => AssignOp::Exp,
            TokenKind::ShlAssign => AssignOp::Shl,
            TokenKind::ShrAssign => AssignOp::Shr,
            TokenKind::UShrAssign => AssignOp::UShr,
            TokenKind::BitAndAssign => AssignOp::BitAnd,
            TokenKind::BitOrAssign => AssignOp::BitOr,
            TokenKind::BitXorAssign => AssignOp::BitXor,
            TokenKind::AndAndAssign => AssignOp::And,
            TokenKind::OrOrAssign => AssignOp::Or,
            TokenKind::NullishAssign => AssignOp::Nullish,
            _ => return Some(left),
        };
        self.advance();
        let target = self.expr_to_assign_target(&left)?;
        if op != AssignOp::Assign && matches!(target, AssignTarget::Pattern(_)) {
            self.error_here("destructuring is only valid with plain assignment");
            return None;
        }
        let value = self.parse_assignment(no_in)?;
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Assign {
                op,
                target: Box::new(target),
                value: Box::new(value),
            },
        })
    }

    fn parse_conditional(&mut self, no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let test = self.parse_binary(0, no_in)?;
        if !self.eat(&TokenKind::Question) {
            return Some(test);
        }
        let then = self.parse_assignment(false)?;
        self.expect(&TokenKind::Colon, ": in conditional expression");
        let otherwise = self.parse_assignment(no_in)?;
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Cond {
                test: Box::new(test),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            },
        })
    }

    /// Binary operator precedence climbing. Logical and nullish operators
    /// are folded into the same ladder with their ECMA precedences; mixing
    /// `??` with `&&`/`||` without parentheses is rejected.
    fn parse_binary(&mut self, min_prec: u8, no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let mut left = self.parse_unary(no_in)?;
        loop {
            let Some((prec, op)) = self.peek_binary_op(no_in) else {
                return Some(left);
            };
            if prec < min_prec {
                return Some(left);
            }
            if let BinaryKind::Logical(LogicalOp::Nullish) = op {
                if matches!(
                    left.kind,
                    ExprKind::Logical {
                        op: LogicalOp::And | LogicalOp::Or,
                        ..
                    }
                ) {
                    self.error_here("cannot mix ?? with && or || without parentheses");
                }
            }
            self.advance();
            // Exponentiation is right-associative; everything else binds left.
            let next_min = if matches!(op, BinaryKind::Plain(BinOp::Exp)) {
                prec
            } else {
                prec + 1
            };
            let right = self.parse_binary(next_min, no_in)?;
            let kind = match op {
                BinaryKind::Plain(op) => ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                BinaryKind::Logical(op) => ExprKind::Logical {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
            };
            left = Expr {
                span: self.span_from(start),
                line,
                kind,
            };
        }
    }

    fn peek_binary_op(&self, no_in: bool) -> Option<(u8, BinaryKind)> {
        use TokenKind as T;
        Some(match self.current.kind {
            T::NullishCoalesce => (1, BinaryKind::Logical(LogicalOp::Nullish)),
            T::OrOr => (1, BinaryKind::Logical(LogicalOp::Or)),
            T::AndAnd => (2, BinaryKind::Logical(LogicalOp::And)),
            T::BitOr => (3, BinaryKind::Plain(BinOp::BitOr)),
            T::BitXor => (4, BinaryKind::Plain(BinOp::BitXor)),
            T::BitAnd => (5, BinaryKind::Plain(BinOp::BitAnd)),
            T::Eq => (6, BinaryKind::Plain(BinOp::Eq)),
            T::Ne => (6, BinaryKind::Plain(BinOp::Ne)),
            T::StrictEq => (6, BinaryKind::Plain(BinOp::StrictEq)),
            T::StrictNe => (6, BinaryKind::Plain(BinOp::StrictNe)),
            T::Lt => (7, BinaryKind::Plain(BinOp::Lt)),
            T::Gt => (7, BinaryKind::Plain(BinOp::Gt)),
            T::Le => (7, BinaryKind::Plain(BinOp::Le)),
            T::Ge => (7, BinaryKind::Plain(BinOp::Ge)),
            T::Instanceof => (7, BinaryKind::Plain(BinOp::Instanceof)),
            T::In if !no_in => (7, BinaryKind::Plain(BinOp::In)),
            T::Shl => (8, BinaryKind::Plain(BinOp::Shl)),
            T::Shr => (8, BinaryKind::Plain(BinOp::Shr)),
            T::UShr => (8, BinaryKind::Plain(BinOp::UShr)),
            T::Plus => (9, BinaryKind::Plain(BinOp::Add)),
            T::Minus => (9, BinaryKind::Plain(BinOp::Sub)),
            T::Star => (10, BinaryKind::Plain(BinOp::Mul)),
            T::Div => (10, BinaryKind::Plain(BinOp::Div)),
            T::Mod => (10, BinaryKind::Plain(BinOp::Mod)),
            T::StarStar => (11, BinaryKind::Plain(BinOp::Exp)),
            _ => return None,
        })
    }

    fn parse_unary(&mut self, no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let op = match self.current.kind {
            TokenKind::Not => Some(UnaryOp::Not),
            TokenKind::BitNot => Some(UnaryOp::BitNot),
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary(no_in)?;
            return Some(Expr {
                span: self.span_from(start),
                line,
                kind: ExprKind::Unary {
                    op,
                    expr: Box::new(operand),
                },
            });
        }
        if matches!(self.current.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) {
            let op = if self.at(&TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            let operand = self.parse_unary(no_in)?;
            let target = self.expr_to_assign_target(&operand)?;
            if matches!(target, AssignTarget::Pattern(_)) {
                self.error_here("invalid increment/decrement target");
                return None;
            }
            return Some(Expr {
                span: self.span_from(start),
                line,
                kind: ExprKind::Update {
                    op,
                    prefix: true,
                    target: Box::new(target),
                },
            });
        }
        self.parse_postfix(no_in)
    }

    fn parse_postfix(&mut self, _no_in: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let operand = self.parse_call_member(true)?;
        // Postfix ++/-- is a restricted production: a line terminator before
        // the operator terminates the expression instead.
        if matches!(self.current.kind, TokenKind::PlusPlus | TokenKind::MinusMinus) && !self.current.newline_before {
            let op = if self.at(&TokenKind::PlusPlus) {
                UpdateOp::Inc
            } else {
                UpdateOp::Dec
            };
            self.advance();
            let target = self.expr_to_assign_target(&operand)?;
            if matches!(target, AssignTarget::Pattern(_)) {
                self.error_here("invalid increment/decrement target");
                return None;
            }
            return Some(Expr {
                span: self.span_from(start),
                line,
                kind: ExprKind::Update {
                    op,
                    prefix: false,
                    target: Box::new(target),
                },
            });
        }
        Some(operand)
    }

    /// Member accesses and calls, including optional chaining. When any link
    /// used `?.`, the whole chain is wrapped in an `OptionalChain` head so
    /// the evaluator knows where short-circuiting stops.
    fn parse_call_member(&mut self, allow_call: bool) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let mut expr = if self.at(&TokenKind::New) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        let mut has_optional = false;
        loop {
            match &self.current.kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.parse_member_name()?;
                    expr = Expr {
                        span: self.span_from(start),
                        line,
                        kind: ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberKey::Static(name),
                            optional: false,
                        },
                    };
                }
                TokenKind::OptionalDot => {
                    self.advance();
                    has_optional = true;
                    match &self.current.kind {
                        TokenKind::LParen => {
                            self.advance();
                            let args = self.parse_arguments()?;
                            expr = Expr {
                                span: self.span_from(start),
                                line,
                                kind: ExprKind::Call {
                                    callee: Box::new(expr),
                                    args,
                                    optional: true,
                                },
                            };
                        }
                        TokenKind::LBracket => {
                            self.advance();
                            let prop = self.parse_expression(false)?;
                            self.expect(&TokenKind::RBracket, "] after computed member");
                            expr = Expr {
                                span: self.span_from(start),
                                line,
                                kind: ExprKind::Member {
                                    object: Box::new(expr),
                                    property: MemberKey::Computed(Box::new(prop)),
                                    optional: true,
                                },
                            };
                        }
                        _ => {
                            let name = self.parse_member_name()?;
                            expr = Expr {
                                span: self.span_from(start),
                                line,
                                kind: ExprKind::Member {
                                    object: Box::new(expr),
                                    property: MemberKey::Static(name),
                                    optional: true,
                                },
                            };
                        }
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let prop = self.parse_expression(false)?;
                    self.expect(&TokenKind::RBracket, "] after computed member");
                    expr = Expr {
                        span: self.span_from(start),
                        line,
                        kind: ExprKind::Member {
                            object: Box::new(expr),
                            property: MemberKey::Computed(Box::new(prop)),
                            optional: false,
                        },
                    };
                }
                TokenKind::LParen if allow_call => {
                    self.advance();
                    let args = self.parse_arguments()?;
                    expr = Expr {
                        span: self.span_from(start),
                        line,
                        kind: ExprKind::Call {
                            callee: Box::new(expr),
                            args,
                            optional: false,
                        },
                    };
                }
                TokenKind::NoSubTemplate(_) | TokenKind::TemplateHead(_) => {
                    self.error_here("tagged template literals are not supported");
                    return None;
                }
                _ => break,
            }
        }
        if has_optional {
            expr = Expr {
                span: self.span_from(start),
                line,
                kind: ExprKind::OptionalChain(Box::new(expr)),
            };
        }
        Some(expr)
    }

    /// Member name after `.` or `?.`; keywords are allowed here.
    fn parse_member_name(&mut self) -> Option<Name> {
        let kind = self.current.kind.clone();
        match kind {
            TokenKind::Ident(name) => {
                self.advance();
                Some(name)
            }
            other => {
                if let Some(text) = keyword_text(&other) {
                    self.advance();
                    Some(self.interner.intern(text))
                } else {
                    self.error_here("expected a property name after .");
                    None
                }
            }
        }
    }

    fn parse_new(&mut self) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        self.advance(); // new
        // The callee of `new` is a member expression without calls, so that
        // `new a.b()` news `a.b` rather than calling it.
        let callee = self.parse_call_member(false)?;
        let args = if self.eat(&TokenKind::LParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::New {
                callee: Box::new(callee),
                args,
            },
        })
    }

    /// Call arguments after the opening paren; consumes the closing paren.
    fn parse_arguments(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Some(args);
        }
        loop {
            if self.at(&TokenKind::DotDotDot) {
                let start = self.current.start;
                let line = self.current.line;
                self.advance();
                let inner = self.parse_assignment(false)?;
                args.push(Expr {
                    span: self.span_from(start),
                    line,
                    kind: ExprKind::Spread(Box::new(inner)),
                });
            } else {
                args.push(self.parse_assignment(false)?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
            if self.at(&TokenKind::RParen) {
                break;
            }
        }
        self.expect(&TokenKind::RParen, ") after arguments");
        Some(args)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        let kind = match self.current.kind.clone() {
            TokenKind::Number(value) => {
                self.advance();
                ExprKind::Number(value)
            }
            TokenKind::BigInt(value) => {
                self.advance();
                ExprKind::BigInt(value)
            }
            TokenKind::Str(value) => {
                self.advance();
                ExprKind::Str(value)
            }
            TokenKind::RegExp(source, flags) => {
                self.advance();
                ExprKind::Regex { source, flags }
            }
            TokenKind::NoSubTemplate(chunk) => {
                self.advance();
                ExprKind::Template {
                    quasis: vec![chunk],
                    exprs: Vec::new(),
                }
            }
            TokenKind::TemplateHead(first) => {
                self.advance();
                return self.parse_template_rest(first, start, line);
            }
            TokenKind::True => {
                self.advance();
                ExprKind::Bool(true)
            }
            TokenKind::False => {
                self.advance();
                ExprKind::Bool(false)
            }
            TokenKind::Null => {
                self.advance();
                ExprKind::Null
            }
            TokenKind::This => {
                self.advance();
                ExprKind::This
            }
            TokenKind::Ident(name) => {
                self.advance();
                ExprKind::Ident(NameRef::new(name))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(false)?;
                self.expect(&TokenKind::RParen, ") after parenthesized expression");
                return Some(inner);
            }
            TokenKind::LBracket => return self.parse_array_literal(),
            TokenKind::LBrace => return self.parse_object_literal(),
            TokenKind::Function => {
                self.advance();
                let name = if let TokenKind::Ident(name) = &self.current.kind {
                    let name = Rc::clone(name);
                    self.advance();
                    Some(name)
                } else {
                    None
                };
                let func = self.parse_function_rest(name, true)?;
                ExprKind::Function(func)
            }
            TokenKind::Yield => {
                self.error_here("yield is only valid inside generators, which are not supported");
                return None;
            }
            TokenKind::Reserved(word) => {
                self.error_here(&format!("\"{word}\" is reserved and not supported"));
                return None;
            }
            _ => {
                self.error_here("unexpected token in expression position");
                return None;
            }
        };
        Some(Expr {
            span: self.span_from(start),
            line,
            kind,
        })
    }

    fn parse_template_rest(&mut self, first: Rc<str>, start: u32, line: u32) -> Option<Expr> {
        let mut quasis = vec![first];
        let mut exprs = Vec::new();
        loop {
            exprs.push(self.parse_expression(false)?);
            match self.current.kind.clone() {
                TokenKind::TemplateMiddle(chunk) => {
                    self.advance();
                    quasis.push(chunk);
                }
                TokenKind::TemplateTail(chunk) => {
                    self.advance();
                    quasis.push(chunk);
                    break;
                }
                _ => {
                    self.error_here("unterminated template substitution");
                    return None;
                }
            }
        }
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Template { quasis, exprs },
        })
    }

    fn parse_array_literal(&mut self) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        self.advance(); // [
        let mut elements = Vec::new();
        loop {
            match &self.current.kind {
                TokenKind::RBracket => break,
                TokenKind::Comma => {
                    self.advance();
                    elements.push(None);
                    continue;
                }
                TokenKind::DotDotDot => {
                    let spread_start = self.current.start;
                    let spread_line = self.current.line;
                    self.advance();
                    let inner = self.parse_assignment(false)?;
                    elements.push(Some(Expr {
                        span: self.span_from(spread_start),
                        line: spread_line,
                        kind: ExprKind::Spread(Box::new(inner)),
                    }));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                _ => {
                    elements.push(Some(self.parse_assignment(false)?));
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
            }
        }
        self.expect(&TokenKind::RBracket, "] after array literal");
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Array(elements),
        })
    }

    fn parse_object_literal(&mut self) -> Option<Expr> {
        let start = self.current.start;
        let line = self.current.line;
        self.advance(); // {
        let mut props = Vec::new();
        while !matches!(self.current.kind, TokenKind::RBrace | TokenKind::Eof) {
            if self.at(&TokenKind::DotDotDot) {
                self.advance();
                let inner = self.parse_assignment(false)?;
                props.push(PropInit::Spread(inner));
            } else {
                props.push(self.parse_object_prop()?);
            }
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RBrace, "} after object literal");
        Some(Expr {
            span: self.span_from(start),
            line,
            kind: ExprKind::Object(props),
        })
    }

    fn parse_object_prop(&mut self) -> Option<PropInit> {
        // get/set accessors: contextual keyword followed by a property name.
        if let TokenKind::Ident(word) = &self.current.kind {
            let word = Rc::clone(word);
            if (&*word == "get" || &*word == "set")
                && matches!(
                    self.peek_second(),
                    TokenKind::Ident(_) | TokenKind::Str(_) | TokenKind::Number(_) | TokenKind::LBracket
                )
            {
                self.advance();
                let key = self.parse_prop_name()?;
                let func_start = self.current.start;
                let func_line = self.current.line;
                self.expect(&TokenKind::LParen, "( in accessor definition");
                let (params, rest_param) = self.parse_param_list()?;
                let body = self.parse_function_body_block()?;
                let func = self.register_function(FunctionDef {
                    span: Span::new(func_start, self.prev_end.saturating_sub(func_start)),
                    line: func_line,
                    name: None,
                    params,
                    rest_param,
                    body: FuncBody::Block(body),
                    scope: ScopeInfo::default(),
                    hoisted_fns: Vec::new(),
                    self_slot: None,
                    is_arrow: false,
                    strict: self.strict,
                });
                return Some(if &*word == "get" {
                    PropInit::Getter { key, func }
                } else {
                    PropInit::Setter { key, func }
                });
            }
        }

        let key = self.parse_prop_name()?;
        match &self.current.kind {
            TokenKind::Colon => {
                self.advance();
                let value = self.parse_assignment(false)?;
                Some(PropInit::KeyValue { key, value })
            }
            TokenKind::LParen => {
                // Method shorthand.
                let func_start = self.current.start;
                let func_line = self.current.line;
                self.advance();
                let (params, rest_param) = self.parse_param_list()?;
                let body = self.parse_function_body_block()?;
                let name = match &key {
                    PropName::Ident(name) => Some(Rc::clone(name)),
                    _ => None,
                };
                let func = self.register_function(FunctionDef {
                    span: Span::new(func_start, self.prev_end.saturating_sub(func_start)),
                    line: func_line,
                    name,
                    params,
                    rest_param,
                    body: FuncBody::Block(body),
                    scope: ScopeInfo::default(),
                    hoisted_fns: Vec::new(),
                    self_slot: None,
                    is_arrow: false,
                    strict: self.strict,
                });
                Some(PropInit::Method { key, func })
            }
            TokenKind::Assign => {
                // Cover grammar for destructuring: `{a = 1}` is only valid
                // when the literal is converted to a pattern. Represent it
                // as a key-value whose value is an assignment so the
                // conversion can pick up the default; the prepare pass
                // rejects any that survive as expressions.
                let PropName::Ident(name) = &key else {
                    self.error_here("unexpected = in object literal");
                    return None;
                };
                let name = Rc::clone(name);
                let start = self.current.start;
                let line = self.current.line;
                self.advance();
                let value = self.parse_assignment(false)?;
                let target = AssignTarget::Ident(NameRef::new(Rc::clone(&name)));
                Some(PropInit::KeyValue {
                    key,
                    value: Expr {
                        span: self.span_from(start),
                        line,
                        kind: ExprKind::Assign {
                            op: AssignOp::Assign,
                            target: Box::new(target),
                            value: Box::new(value),
                        },
                    },
                })
            }
            _ => match key {
                PropName::Ident(name) => Some(PropInit::Shorthand(NameRef::new(name))),
                _ => {
                    self.error_here("expected : after property name");
                    None
                }
            },
        }
    }
}

enum BinaryKind {
    Plain(BinOp),
    Logical(LogicalOp),
}

/// Returns the directive string when `stmt` is a bare string-literal
/// expression statement.
fn directive_of(stmt: &Stmt) -> Option<Rc<str>> {
    if let StmtKind::Expr(Expr {
        kind: ExprKind::Str(s), ..
    }) = &stmt.kind
    {
        Some(Rc::clone(s))
    } else {
        None
    }
}

/// Text of keyword tokens usable as property names.
fn keyword_text(kind: &TokenKind) -> Option<&'static str> {
    use TokenKind as T;
    Some(match kind {
        T::Break => "break",
        T::Case => "case",
        T::Catch => "catch",
        T::Const => "const",
        T::Continue => "continue",
        T::Debugger => "debugger",
        T::Default => "default",
        T::Delete => "delete",
        T::Do => "do",
        T::Else => "else",
        T::Finally => "finally",
        T::For => "for",
        T::Function => "function",
        T::If => "if",
        T::In => "in",
        T::Instanceof => "instanceof",
        T::Let => "let",
        T::New => "new",
        T::Null => "null",
        T::Return => "return",
        T::Switch => "switch",
        T::This => "this",
        T::Throw => "throw",
        T::True => "true",
        T::False => "false",
        T::Try => "try",
        T::Typeof => "typeof",
        T::Var => "var",
        T::Void => "void",
        T::While => "while",
        T::With => "with",
        T::Yield => "yield",
        _ => return None,
    })
}
