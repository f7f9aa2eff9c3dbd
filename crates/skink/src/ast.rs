//! Abstract syntax tree produced by the parser.
//!
//! Positions follow the convention of the node tree being the unit of
//! addressing: after parsing every node's `span.pos` is relative to its
//! parent node, and the absolute offset of a node is recovered by summing
//! positions while walking down from the root. The parser builds the tree
//! with absolute positions and [`ScriptAst::rebase_positions`] rewrites them
//! during finalization.

use std::rc::Rc;

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::intern::Name;

/// Index of a function definition in [`ScriptAst::functions`].
pub type FuncId = u32;

/// A source region. `pos` is parent-relative after parse finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub pos: u32,
    pub len: u32,
}

impl Span {
    pub fn new(pos: u32, len: u32) -> Self {
        Self { pos, len }
    }

    pub fn end(&self) -> u32 {
        self.pos + self.len
    }
}

/// Declaration keyword of a variable statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclKind {
    Var,
    Let,
    Const,
}

/// How a binding was introduced, recorded in scope symbol tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindKind {
    Function,
    Param,
    Var,
    Let,
    Const,
    /// The implicit catch-clause binding.
    CatchParam,
}

impl BindKind {
    /// Bindings that hoist to the enclosing function or script scope.
    pub fn hoists(self) -> bool {
        matches!(self, Self::Function | Self::Var)
    }

    /// Bindings subject to the temporal dead zone.
    pub fn has_tdz(self) -> bool {
        matches!(self, Self::Let | Self::Const)
    }

    pub fn is_const(self) -> bool {
        matches!(self, Self::Const)
    }
}

/// One entry of a scope's symbol table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingInfo {
    pub name: Name,
    pub kind: BindKind,
    /// Frame slot assigned by the prepare pass.
    pub slot: u16,
}

/// Symbol table of a lexical scope (function, block, for-head, switch,
/// catch). Slot order matches the runtime frame layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeInfo {
    pub bindings: Vec<BindingInfo>,
}

impl ScopeInfo {
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&BindingInfo> {
        self.bindings.iter().find(|b| &*b.name == name)
    }
}

/// How an identifier reference resolves at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    /// Not yet resolved; only valid before the prepare pass.
    Unresolved,
    /// Frame-local slot: `hops` frames up the environment chain, then
    /// `index` into that frame.
    Slot { hops: u16, index: u16 },
    /// Property of the global object.
    Global,
    /// Name lexically inside a `with` statement; resolved by name at
    /// runtime so the `with` object can shadow outer bindings.
    Dynamic,
}

/// An identifier reference with its resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NameRef {
    pub name: Name,
    pub res: Resolution,
}

impl NameRef {
    pub fn new(name: Name) -> Self {
        Self {
            name,
            res: Resolution::Unresolved,
        }
    }
}

/// Property name in an object literal or member pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropName {
    Ident(Name),
    Str(Rc<str>),
    Num(f64),
    Computed(Box<Expr>),
}

/// Property initializer in an object literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PropInit {
    KeyValue { key: PropName, value: Expr },
    Shorthand(NameRef),
    Method { key: PropName, func: FuncId },
    Getter { key: PropName, func: FuncId },
    Setter { key: PropName, func: FuncId },
    Spread(Expr),
}

/// Member access key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MemberKey {
    Static(Name),
    Computed(Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
    BitNot,
    Typeof,
    Void,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    In,
    Instanceof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Exp,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Nullish,
}

impl AssignOp {
    /// The plain binary operator applied by a compound assignment.
    pub fn binary_op(self) -> Option<BinOp> {
        Some(match self {
            Self::Assign | Self::And | Self::Or | Self::Nullish => return None,
            Self::Add => BinOp::Add,
            Self::Sub => BinOp::Sub,
            Self::Mul => BinOp::Mul,
            Self::Div => BinOp::Div,
            Self::Mod => BinOp::Mod,
            Self::Exp => BinOp::Exp,
            Self::Shl => BinOp::Shl,
            Self::Shr => BinOp::Shr,
            Self::UShr => BinOp::UShr,
            Self::BitAnd => BinOp::BitAnd,
            Self::BitOr => BinOp::BitOr,
            Self::BitXor => BinOp::BitXor,
        })
    }
}

/// Assignment target of an `=` or compound assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AssignTarget {
    Ident(NameRef),
    Member {
        object: Box<Expr>,
        property: MemberKey,
    },
    /// Destructuring assignment (`[a, b] = xs`, `({x} = o)`).
    Pattern(Box<Pattern>),
}

/// An expression node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expr {
    pub span: Span,
    pub line: u32,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ExprKind {
    Number(f64),
    BigInt(Rc<BigInt>),
    Str(Rc<str>),
    Bool(bool),
    Null,
    Regex { source: Rc<str>, flags: Rc<str> },
    Ident(NameRef),
    This,
    Array(Vec<Option<Expr>>),
    Object(Vec<PropInit>),
    Function(FuncId),
    Arrow(FuncId),
    Template { quasis: Vec<Rc<str>>, exprs: Vec<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    Update { op: UpdateOp, prefix: bool, target: Box<AssignTarget> },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    Logical { op: LogicalOp, left: Box<Expr>, right: Box<Expr> },
    Cond { test: Box<Expr>, then: Box<Expr>, otherwise: Box<Expr> },
    Assign { op: AssignOp, target: Box<AssignTarget>, value: Box<Expr> },
    Seq(Vec<Expr>),
    Call { callee: Box<Expr>, args: Vec<Expr>, optional: bool },
    New { callee: Box<Expr>, args: Vec<Expr> },
    Member { object: Box<Expr>, property: MemberKey, optional: bool },
    /// Head of an optional chain. Evaluation of the inner expression
    /// short-circuits to `undefined` at this node when an optional link
    /// finds `null`/`undefined`, without evaluating the rest of the chain.
    OptionalChain(Box<Expr>),
    /// Spread element; only valid inside array literals and call argument
    /// lists.
    Spread(Box<Expr>),
}

/// A binding or assignment pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub span: Span,
    pub line: u32,
    pub kind: PatternKind,
    /// Default value used when the matched value is `undefined`.
    pub default: Option<Box<Expr>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PatternKind {
    Ident(NameRef),
    Array {
        elements: Vec<Option<Pattern>>,
        rest: Option<Box<Pattern>>,
    },
    Object {
        props: Vec<(PropName, Pattern)>,
        rest: Option<Box<Pattern>>,
    },
    /// Member expression target, valid in destructuring assignment only.
    Member {
        object: Box<Expr>,
        property: MemberKey,
    },
}

/// A statement node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stmt {
    pub span: Span,
    pub line: u32,
    pub kind: StmtKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub scope: ScopeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declarator {
    pub pattern: Pattern,
    pub init: Option<Expr>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarDecl {
    pub kind: DeclKind,
    pub decls: Vec<Declarator>,
}

/// Loop head of `for…in` / `for…of`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForHead {
    Decl(DeclKind, Pattern),
    Target(Pattern),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForInit {
    Decl(VarDecl),
    Expr(Expr),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchCase {
    /// `None` for the `default` clause.
    pub test: Option<Expr>,
    pub body: Vec<Stmt>,
    pub line: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub param: Option<Pattern>,
    pub body: Block,
    /// Scope holding the catch parameter bindings.
    pub scope: ScopeInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtKind {
    Expr(Expr),
    VarDecl(VarDecl),
    FunctionDecl { name: NameRef, func: FuncId },
    Return(Option<Expr>),
    If {
        test: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Block(Block),
    Empty,
    While { test: Expr, body: Box<Stmt> },
    DoWhile { body: Box<Stmt>, test: Expr },
    For {
        init: Option<ForInit>,
        test: Option<Expr>,
        update: Option<Expr>,
        body: Box<Stmt>,
        /// Scope for `let`/`const` bindings in the init clause.
        scope: ScopeInfo,
    },
    ForIn {
        left: ForHead,
        object: Expr,
        body: Box<Stmt>,
        scope: ScopeInfo,
    },
    ForOf {
        left: ForHead,
        iterable: Expr,
        body: Box<Stmt>,
        scope: ScopeInfo,
    },
    Switch {
        disc: Expr,
        cases: Vec<SwitchCase>,
        /// Shared block scope of all case bodies.
        scope: ScopeInfo,
    },
    Break(Option<Name>),
    Continue(Option<Name>),
    Labeled { label: Name, body: Box<Stmt> },
    Try {
        block: Block,
        catch: Option<CatchClause>,
        finally: Option<Block>,
    },
    Throw(Expr),
    With { object: Expr, body: Box<Stmt> },
    Debugger,
}

/// Function body: a block, or a bare expression for concise arrows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FuncBody {
    Block(Block),
    Expr(Box<Expr>),
}

/// A function definition. Functions are also scopes; `scope` holds params,
/// hoisted `var`s, and nested function declarations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub span: Span,
    pub line: u32,
    pub name: Option<Name>,
    pub params: Vec<Pattern>,
    /// `...rest` parameter, bound to an array of the remaining arguments.
    pub rest_param: Option<Box<Pattern>>,
    pub body: FuncBody,
    pub scope: ScopeInfo,
    /// Slots of function declarations hoisted to this scope, filled by the
    /// prepare pass in source order.
    pub hoisted_fns: Vec<(u16, FuncId)>,
    /// Slot binding the function's own name inside its body, for named
    /// function expressions. Filled by the prepare pass.
    pub self_slot: Option<u16>,
    pub is_arrow: bool,
    pub strict: bool,
}

/// A comment recorded during lexing, position absolute in the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub span: Span,
    pub text: Rc<str>,
    pub line: u32,
    pub is_block: bool,
}

/// Root of a parsed script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAst {
    /// Covers the whole source; `pos` is 0.
    pub span: Span,
    pub body: Vec<Stmt>,
    /// Top-level `let`/`const` bindings. Top-level `var` and function
    /// declarations bind on the global object instead.
    pub scope: ScopeInfo,
    pub functions: Vec<FunctionDef>,
    /// Names of top-level `var` declarations, installed on the global
    /// object as `undefined` before execution. Filled by the prepare pass.
    pub global_vars: Vec<Name>,
    /// Top-level function declarations hoisted onto the global object, in
    /// source order. Filled by the prepare pass.
    pub global_fns: Vec<(Name, FuncId)>,
    /// All comments, sorted by source position.
    pub comments: Vec<Comment>,
    pub source_name: String,
    pub strict: bool,
}

// ---------------------------------------------------------------------------
// Position rebasing: absolute -> parent-relative.
// ---------------------------------------------------------------------------

impl ScriptAst {
    /// Rewrites all node positions from absolute offsets to parent-relative
    /// ones. Called once by the parser during finalization; children of the
    /// root stay absolute since the root starts at offset 0.
    pub(crate) fn rebase_positions(&mut self) {
        let root_abs = self.span.pos;
        for stmt in &mut self.body {
            rebase_stmt(stmt, root_abs);
        }
        for func in &mut self.functions {
            let func_abs = func.span.pos;
            // Function spans stay relative to the root rather than to their
            // use site, since the definition table is root-owned.
            func.span.pos -= root_abs;
            for param in &mut func.params {
                rebase_pattern(param, func_abs);
            }
            if let Some(rest) = &mut func.rest_param {
                rebase_pattern(rest, func_abs);
            }
            match &mut func.body {
                FuncBody::Block(block) => rebase_block_stmts(block, func_abs),
                FuncBody::Expr(expr) => rebase_expr(expr, func_abs),
            }
        }
    }

    /// Checks the position invariant: every node's `pos` is within its
    /// parent and `pos + len` does not exceed the parent's extent. Returns
    /// the first violation found, described for diagnostics.
    pub fn verify_positions(&self) -> Result<(), String> {
        for stmt in &self.body {
            verify_stmt(stmt, self.span.len)?;
        }
        for func in &self.functions {
            check_child(func.span, self.span.len, "function")?;
            for param in &func.params {
                verify_pattern(param, func.span.len)?;
            }
            if let Some(rest) = &func.rest_param {
                verify_pattern(rest, func.span.len)?;
            }
            match &func.body {
                FuncBody::Block(block) => {
                    for stmt in &block.stmts {
                        verify_stmt(stmt, func.span.len)?;
                    }
                }
                FuncBody::Expr(expr) => verify_expr(expr, func.span.len)?,
            }
        }
        Ok(())
    }
}

fn check_child(span: Span, parent_len: u32, what: &str) -> Result<(), String> {
    if span.pos + span.len > parent_len {
        return Err(format!(
            "{what} extends past its parent: pos {} + len {} > parent len {parent_len}",
            span.pos, span.len
        ));
    }
    Ok(())
}

fn rebase_block_stmts(block: &mut Block, parent_abs: u32) {
    for stmt in &mut block.stmts {
        rebase_stmt(stmt, parent_abs);
    }
}

fn rebase_stmt(stmt: &mut Stmt, parent_abs: u32) {
    let abs = stmt.span.pos;
    stmt.span.pos = abs.saturating_sub(parent_abs);
    match &mut stmt.kind {
        StmtKind::Expr(expr) | StmtKind::Throw(expr) => rebase_expr(expr, abs),
        StmtKind::VarDecl(decl) => rebase_var_decl(decl, abs),
        StmtKind::FunctionDecl { .. } | StmtKind::Empty | StmtKind::Debugger => {}
        StmtKind::Return(expr) => {
            if let Some(expr) = expr {
                rebase_expr(expr, abs);
            }
        }
        StmtKind::If { test, then, otherwise } => {
            rebase_expr(test, abs);
            rebase_stmt(then, abs);
            if let Some(otherwise) = otherwise {
                rebase_stmt(otherwise, abs);
            }
        }
        StmtKind::Block(block) => rebase_block_stmts(block, abs),
        StmtKind::While { test, body } => {
            rebase_expr(test, abs);
            rebase_stmt(body, abs);
        }
        StmtKind::DoWhile { body, test } => {
            rebase_stmt(body, abs);
            rebase_expr(test, abs);
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(ForInit::Decl(decl)) => rebase_var_decl(decl, abs),
                Some(ForInit::Expr(expr)) => rebase_expr(expr, abs),
                None => {}
            }
            if let Some(test) = test {
                rebase_expr(test, abs);
            }
            if let Some(update) = update {
                rebase_expr(update, abs);
            }
            rebase_stmt(body, abs);
        }
        StmtKind::ForIn { left, object, body, .. } => {
            rebase_for_head(left, abs);
            rebase_expr(object, abs);
            rebase_stmt(body, abs);
        }
        StmtKind::ForOf {
            left, iterable, body, ..
        } => {
            rebase_for_head(left, abs);
            rebase_expr(iterable, abs);
            rebase_stmt(body, abs);
        }
        StmtKind::Switch { disc, cases, .. } => {
            rebase_expr(disc, abs);
            for case in cases {
                if let Some(test) = &mut case.test {
                    rebase_expr(test, abs);
                }
                for stmt in &mut case.body {
                    rebase_stmt(stmt, abs);
                }
            }
        }
        StmtKind::Break(_) | StmtKind::Continue(_) => {}
        StmtKind::Labeled { body, .. } => rebase_stmt(body, abs),
        StmtKind::Try { block, catch, finally } => {
            rebase_block_stmts(block, abs);
            if let Some(catch) = catch {
                if let Some(param) = &mut catch.param {
                    rebase_pattern(param, abs);
                }
                rebase_block_stmts(&mut catch.body, abs);
            }
            if let Some(finally) = finally {
                rebase_block_stmts(finally, abs);
            }
        }
        StmtKind::With { object, body } => {
            rebase_expr(object, abs);
            rebase_stmt(body, abs);
        }
    }
}

fn rebase_for_head(head: &mut ForHead, parent_abs: u32) {
    match head {
        ForHead::Decl(_, pattern) | ForHead::Target(pattern) => rebase_pattern(pattern, parent_abs),
    }
}

fn rebase_var_decl(decl: &mut VarDecl, parent_abs: u32) {
    for declarator in &mut decl.decls {
        rebase_pattern(&mut declarator.pattern, parent_abs);
        if let Some(init) = &mut declarator.init {
            rebase_expr(init, parent_abs);
        }
    }
}

fn rebase_pattern(pattern: &mut Pattern, parent_abs: u32) {
    let abs = pattern.span.pos;
    pattern.span.pos = abs.saturating_sub(parent_abs);
    if let Some(default) = &mut pattern.default {
        rebase_expr(default, abs);
    }
    match &mut pattern.kind {
        PatternKind::Ident(_) => {}
        PatternKind::Array { elements, rest } => {
            for element in elements.iter_mut().flatten() {
                rebase_pattern(element, abs);
            }
            if let Some(rest) = rest {
                rebase_pattern(rest, abs);
            }
        }
        PatternKind::Object { props, rest } => {
            for (key, value) in props {
                if let PropName::Computed(expr) = key {
                    rebase_expr(expr, abs);
                }
                rebase_pattern(value, abs);
            }
            if let Some(rest) = rest {
                rebase_pattern(rest, abs);
            }
        }
        PatternKind::Member { object, property } => {
            rebase_expr(object, abs);
            if let MemberKey::Computed(expr) = property {
                rebase_expr(expr, abs);
            }
        }
    }
}

fn rebase_assign_target(target: &mut AssignTarget, parent_abs: u32) {
    match target {
        AssignTarget::Ident(_) => {}
        AssignTarget::Member { object, property } => {
            rebase_expr(object, parent_abs);
            if let MemberKey::Computed(expr) = property {
                rebase_expr(expr, parent_abs);
            }
        }
        AssignTarget::Pattern(pattern) => rebase_pattern(pattern, parent_abs),
    }
}

fn rebase_expr(expr: &mut Expr, parent_abs: u32) {
    let abs = expr.span.pos;
    expr.span.pos = abs.saturating_sub(parent_abs);
    match &mut expr.kind {
        ExprKind::Number(_)
        | ExprKind::BigInt(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Regex { .. }
        | ExprKind::Ident(_)
        | ExprKind::This
        | ExprKind::Function(_)
        | ExprKind::Arrow(_) => {}
        ExprKind::Array(elements) => {
            for element in elements.iter_mut().flatten() {
                rebase_expr(element, abs);
            }
        }
        ExprKind::Object(props) => {
            for prop in props {
                match prop {
                    PropInit::KeyValue { key, value } => {
                        if let PropName::Computed(expr) = key {
                            rebase_expr(expr, abs);
                        }
                        rebase_expr(value, abs);
                    }
                    PropInit::Shorthand(_) => {}
                    PropInit::Method { key, .. } | PropInit::Getter { key, .. } | PropInit::Setter { key, .. } => {
                        if let PropName::Computed(expr) = key {
                            rebase_expr(expr, abs);
                        }
                    }
                    PropInit::Spread(expr) => rebase_expr(expr, abs),
                }
            }
        }
        ExprKind::Template { exprs, .. } => {
            for expr in exprs {
                rebase_expr(expr, abs);
            }
        }
        ExprKind::Unary { expr, .. } | ExprKind::Spread(expr) | ExprKind::OptionalChain(expr) => {
            rebase_expr(expr, abs);
        }
        ExprKind::Update { target, .. } => rebase_assign_target(target, abs),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            rebase_expr(left, abs);
            rebase_expr(right, abs);
        }
        ExprKind::Cond { test, then, otherwise } => {
            rebase_expr(test, abs);
            rebase_expr(then, abs);
            rebase_expr(otherwise, abs);
        }
        ExprKind::Assign { target, value, .. } => {
            rebase_assign_target(target, abs);
            rebase_expr(value, abs);
        }
        ExprKind::Seq(exprs) => {
            for expr in exprs {
                rebase_expr(expr, abs);
            }
        }
        ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
            rebase_expr(callee, abs);
            for arg in args {
                rebase_expr(arg, abs);
            }
        }
        ExprKind::Member { object, property, .. } => {
            rebase_expr(object, abs);
            if let MemberKey::Computed(expr) = property {
                rebase_expr(expr, abs);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Position verification (used by tests).
// ---------------------------------------------------------------------------

fn verify_stmt(stmt: &Stmt, parent_len: u32) -> Result<(), String> {
    check_child(stmt.span, parent_len, "statement")?;
    let len = stmt.span.len;
    match &stmt.kind {
        StmtKind::Expr(expr) | StmtKind::Throw(expr) => verify_expr(expr, len),
        StmtKind::VarDecl(decl) => verify_var_decl(decl, len),
        StmtKind::FunctionDecl { .. } | StmtKind::Empty | StmtKind::Debugger => Ok(()),
        StmtKind::Return(expr) => expr.as_ref().map_or(Ok(()), |e| verify_expr(e, len)),
        StmtKind::If { test, then, otherwise } => {
            verify_expr(test, len)?;
            verify_stmt(then, len)?;
            otherwise.as_ref().map_or(Ok(()), |s| verify_stmt(s, len))
        }
        StmtKind::Block(block) => block.stmts.iter().try_for_each(|s| verify_stmt(s, len)),
        StmtKind::While { test, body } => {
            verify_expr(test, len)?;
            verify_stmt(body, len)
        }
        StmtKind::DoWhile { body, test } => {
            verify_stmt(body, len)?;
            verify_expr(test, len)
        }
        StmtKind::For {
            init,
            test,
            update,
            body,
            ..
        } => {
            match init {
                Some(ForInit::Decl(decl)) => verify_var_decl(decl, len)?,
                Some(ForInit::Expr(expr)) => verify_expr(expr, len)?,
                None => {}
            }
            if let Some(test) = test {
                verify_expr(test, len)?;
            }
            if let Some(update) = update {
                verify_expr(update, len)?;
            }
            verify_stmt(body, len)
        }
        StmtKind::ForIn { left, object, body, .. } => {
            verify_for_head(left, len)?;
            verify_expr(object, len)?;
            verify_stmt(body, len)
        }
        StmtKind::ForOf {
            left, iterable, body, ..
        } => {
            verify_for_head(left, len)?;
            verify_expr(iterable, len)?;
            verify_stmt(body, len)
        }
        StmtKind::Switch { disc, cases, .. } => {
            verify_expr(disc, len)?;
            for case in cases {
                if let Some(test) = &case.test {
                    verify_expr(test, len)?;
                }
                for stmt in &case.body {
                    verify_stmt(stmt, len)?;
                }
            }
            Ok(())
        }
        StmtKind::Break(_) | StmtKind::Continue(_) => Ok(()),
        StmtKind::Labeled { body, .. } => verify_stmt(body, len),
        StmtKind::Try { block, catch, finally } => {
            block.stmts.iter().try_for_each(|s| verify_stmt(s, len))?;
            if let Some(catch) = catch {
                if let Some(param) = &catch.param {
                    verify_pattern(param, len)?;
                }
                catch.body.stmts.iter().try_for_each(|s| verify_stmt(s, len))?;
            }
            if let Some(finally) = finally {
                finally.stmts.iter().try_for_each(|s| verify_stmt(s, len))?;
            }
            Ok(())
        }
        StmtKind::With { object, body } => {
            verify_expr(object, len)?;
            verify_stmt(body, len)
        }
    }
}

fn verify_for_head(head: &ForHead, parent_len: u32) -> Result<(), String> {
    match head {
        ForHead::Decl(_, pattern) | ForHead::Target(pattern) => verify_pattern(pattern, parent_len),
    }
}

fn verify_var_decl(decl: &VarDecl, parent_len: u32) -> Result<(), String> {
    for declarator in &decl.decls {
        verify_pattern(&declarator.pattern, parent_len)?;
        if let Some(init) = &declarator.init {
            verify_expr(init, parent_len)?;
        }
    }
    Ok(())
}

fn verify_pattern(pattern: &Pattern, parent_len: u32) -> Result<(), String> {
    check_child(pattern.span, parent_len, "pattern")?;
    let len = pattern.span.len;
    if let Some(default) = &pattern.default {
        verify_expr(default, len)?;
    }
    match &pattern.kind {
        PatternKind::Ident(_) => Ok(()),
        PatternKind::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                verify_pattern(element, len)?;
            }
            rest.as_ref().map_or(Ok(()), |r| verify_pattern(r, len))
        }
        PatternKind::Object { props, rest } => {
            for (key, value) in props {
                if let PropName::Computed(expr) = key {
                    verify_expr(expr, len)?;
                }
                verify_pattern(value, len)?;
            }
            rest.as_ref().map_or(Ok(()), |r| verify_pattern(r, len))
        }
        PatternKind::Member { object, property } => {
            verify_expr(object, len)?;
            match property {
                MemberKey::Computed(expr) => verify_expr(expr, len),
                MemberKey::Static(_) => Ok(()),
            }
        }
    }
}

fn verify_assign_target(target: &AssignTarget, parent_len: u32) -> Result<(), String> {
    match target {
        AssignTarget::Ident(_) => Ok(()),
        AssignTarget::Member { object, property } => {
            verify_expr(object, parent_len)?;
            match property {
                MemberKey::Computed(expr) => verify_expr(expr, parent_len),
                MemberKey::Static(_) => Ok(()),
            }
        }
        AssignTarget::Pattern(pattern) => verify_pattern(pattern, parent_len),
    }
}

fn verify_expr(expr: &Expr, parent_len: u32) -> Result<(), String> {
    check_child(expr.span, parent_len, "expression")?;
    let len = expr.span.len;
    match &expr.kind {
        ExprKind::Number(_)
        | ExprKind::BigInt(_)
        | ExprKind::Str(_)
        | ExprKind::Bool(_)
        | ExprKind::Null
        | ExprKind::Regex { .. }
        | ExprKind::Ident(_)
        | ExprKind::This
        | ExprKind::Function(_)
        | ExprKind::Arrow(_) => Ok(()),
        ExprKind::Array(elements) => elements.iter().flatten().try_for_each(|e| verify_expr(e, len)),
        ExprKind::Object(props) => {
            for prop in props {
                match prop {
                    PropInit::KeyValue { key, value } => {
                        if let PropName::Computed(expr) = key {
                            verify_expr(expr, len)?;
                        }
                        verify_expr(value, len)?;
                    }
                    PropInit::Shorthand(_) => {}
                    PropInit::Method { key, .. } | PropInit::Getter { key, .. } | PropInit::Setter { key, .. } => {
                        if let PropName::Computed(expr) = key {
                            verify_expr(expr, len)?;
                        }
                    }
                    PropInit::Spread(expr) => verify_expr(expr, len)?,
                }
            }
            Ok(())
        }
        ExprKind::Template { exprs, .. } => exprs.iter().try_for_each(|e| verify_expr(e, len)),
        ExprKind::Unary { expr, .. } | ExprKind::Spread(expr) | ExprKind::OptionalChain(expr) => {
            verify_expr(expr, len)
        }
        ExprKind::Update { target, .. } => verify_assign_target(target, len),
        ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
            verify_expr(left, len)?;
            verify_expr(right, len)
        }
        ExprKind::Cond { test, then, otherwise } => {
            verify_expr(test, len)?;
            verify_expr(then, len)?;
            verify_expr(otherwise, len)
        }
        ExprKind::Assign { target, value, .. } => {
            verify_assign_target(target, len)?;
            verify_expr(value, len)
        }
        ExprKind::Seq(exprs) => exprs.iter().try_for_each(|e| verify_expr(e, len)),
        ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
            verify_expr(callee, len)?;
            args.iter().try_for_each(|a| verify_expr(a, len))
        }
        ExprKind::Member { object, property, .. } => {
            verify_expr(object, len)?;
            match property {
                MemberKey::Computed(expr) => verify_expr(expr, len),
                MemberKey::Static(_) => Ok(()),
            }
        }
    }
}
