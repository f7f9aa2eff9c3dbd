//! Name resolution between parsing and execution.
//!
//! Walks the parsed tree, builds each scope's symbol table, assigns frame
//! slots, and resolves every identifier reference to one of three forms:
//! a `(hops, slot)` pair the evaluator can follow without a name lookup, a
//! global-object property, or a dynamic by-name lookup for code lexically
//! inside `with`. Hoisting happens here: `var` and function declarations
//! bubble to the enclosing function (or the global object at top level),
//! `let`/`const` stay in their block.

use std::rc::Rc;

use crate::{
    ast::{
        AssignTarget, BindKind, BindingInfo, Block, DeclKind, Expr, ExprKind, ForHead, ForInit, FuncBody, FuncId,
        FunctionDef, MemberKey, NameRef, Pattern, PatternKind, PropInit, PropName, Resolution, ScopeInfo, ScriptAst,
        Span, Stmt, StmtKind, VarDecl,
    },
    intern::Name,
    report::ErrorReporter,
};

/// Resolves all names in `ast`, filling scope tables, slot indices, hoisting
/// lists, and `NameRef` resolutions. Duplicate `let`/`const` declarations
/// are reported as errors through `reporter`.
pub(crate) fn prepare(ast: &mut ScriptAst, reporter: &mut dyn ErrorReporter) {
    let mut prep = Prep {
        scopes: Vec::new(),
        with_depth: 0,
        reporter,
        source_name: ast.source_name.clone(),
    };
    prep.run(ast);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Script,
    Function,
    Block,
}

struct PrepScope {
    kind: ScopeKind,
    bindings: Vec<BindingInfo>,
}

impl PrepScope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            bindings: Vec::new(),
        }
    }

    fn find(&self, name: &str) -> Option<&BindingInfo> {
        self.bindings.iter().find(|b| &*b.name == name)
    }

    fn add(&mut self, name: Name, kind: BindKind) -> u16 {
        let slot = self.bindings.len() as u16;
        self.bindings.push(BindingInfo { name, kind, slot });
        slot
    }

    /// Adds the binding unless the name exists, returning the slot either
    /// way. Used for `var` merge semantics and hoisted functions.
    fn add_or_get(&mut self, name: &Name, kind: BindKind) -> u16 {
        if let Some(existing) = self.find(name) {
            existing.slot
        } else {
            self.add(Rc::clone(name), kind)
        }
    }

    /// Whether the runtime creates a frame for this scope. Function and
    /// script frames always exist; block frames only when they bind.
    fn materialized(&self) -> bool {
        matches!(self.kind, ScopeKind::Script | ScopeKind::Function) || !self.bindings.is_empty()
    }

    fn into_scope_info(self) -> ScopeInfo {
        ScopeInfo {
            bindings: self.bindings,
        }
    }
}

struct Prep<'r> {
    scopes: Vec<PrepScope>,
    with_depth: u32,
    reporter: &'r mut dyn ErrorReporter,
    source_name: String,
}

impl Prep<'_> {
    fn run(&mut self, ast: &mut ScriptAst) {
        // Top-level var/function declarations become global object bindings.
        let mut vars = Vec::new();
        let mut fns = Vec::new();
        collect_hoisted(&ast.body, &mut vars, &mut fns);
        let mut seen = Vec::new();
        for (name, _line) in &vars {
            if !seen.iter().any(|n: &Name| n == name) {
                seen.push(Rc::clone(name));
            }
        }
        ast.global_vars = seen;
        ast.global_fns = fns.iter().map(|(name, func, _)| (Rc::clone(name), *func)).collect();

        // Top-level let/const get slots in the script frame.
        let mut scope = PrepScope::new(ScopeKind::Script);
        self.collect_lexical(&ast.body, &mut scope);
        for binding in &scope.bindings {
            if ast.global_vars.iter().any(|n| n == &binding.name)
                || ast.global_fns.iter().any(|(n, _)| n == &binding.name)
            {
                self.duplicate_error(&binding.name, 0);
            }
        }
        self.scopes.push(scope);

        let mut functions = std::mem::take(&mut ast.functions);
        for stmt in &mut ast.body {
            self.resolve_stmt(stmt, &mut functions);
        }
        ast.functions = functions;
        ast.scope = self.scopes.pop().expect("script scope").into_scope_info();
    }

    fn duplicate_error(&mut self, name: &str, line: u32) {
        self.reporter.error(
            &format!("Identifier \"{name}\" has already been declared"),
            &self.source_name,
            line,
            1,
            None,
        );
    }

    /// Collects `let`/`const` declared directly in `stmts` into `scope`,
    /// reporting duplicates.
    fn collect_lexical(&mut self, stmts: &[Stmt], scope: &mut PrepScope) {
        for stmt in stmts {
            if let StmtKind::VarDecl(decl) = &stmt.kind {
                let kind = match decl.kind {
                    DeclKind::Let => BindKind::Let,
                    DeclKind::Const => BindKind::Const,
                    DeclKind::Var => continue,
                };
                for declarator in &decl.decls {
                    let mut names = Vec::new();
                    collect_pattern_names(&declarator.pattern, &mut names);
                    for name in names {
                        if scope.find(&name).is_some() {
                            self.duplicate_error(&name, stmt.line);
                        } else {
                            scope.add(name, kind);
                        }
                    }
                }
            }
        }
    }

    /// Resolves an identifier against the scope stack. Names lexically
    /// inside `with` always resolve dynamically.
    fn resolve_name(&mut self, name_ref: &mut NameRef) {
        if self.with_depth > 0 {
            name_ref.res = Resolution::Dynamic;
            return;
        }
        let mut hops = 0u16;
        for scope in self.scopes.iter().rev() {
            if let Some(binding) = scope.find(&name_ref.name) {
                name_ref.res = Resolution::Slot {
                    hops,
                    index: binding.slot,
                };
                return;
            }
            if scope.materialized() {
                hops += 1;
            }
        }
        name_ref.res = Resolution::Global;
    }

    // -- functions ---------------------------------------------------------

    fn prep_function(&mut self, func: FuncId, fns: &mut Vec<FunctionDef>) {
        let mut def = std::mem::replace(&mut fns[func as usize], dummy_function());
        let mut scope = PrepScope::new(ScopeKind::Function);

        // Parameters bind first.
        for param in &def.params {
            let mut names = Vec::new();
            collect_pattern_names(param, &mut names);
            for name in names {
                scope.add_or_get(&name, BindKind::Param);
            }
        }
        if let Some(rest) = &def.rest_param {
            let mut names = Vec::new();
            collect_pattern_names(rest, &mut names);
            for name in names {
                scope.add_or_get(&name, BindKind::Param);
            }
        }

        // A named function expression sees its own name as a binding.
        let self_slot = match &def.name {
            Some(name) if scope.find(name).is_none() => Some(scope.add(Rc::clone(name), BindKind::Function)),
            _ => None,
        };

        // Hoisted declarations from the body.
        let mut hoisted_fns = Vec::new();
        if let FuncBody::Block(block) = &def.body {
            let mut vars = Vec::new();
            let mut fn_decls = Vec::new();
            collect_hoisted(&block.stmts, &mut vars, &mut fn_decls);
            for (name, _line) in &vars {
                scope.add_or_get(name, BindKind::Var);
            }
            for (name, id, _line) in &fn_decls {
                let slot = scope.add_or_get(name, BindKind::Function);
                hoisted_fns.push((slot, *id));
            }
            // Body-level let/const share the function frame so collisions
            // with params and vars are caught here.
            for stmt in &block.stmts {
                if let StmtKind::VarDecl(decl) = &stmt.kind {
                    let kind = match decl.kind {
                        DeclKind::Let => BindKind::Let,
                        DeclKind::Const => BindKind::Const,
                        DeclKind::Var => continue,
                    };
                    for declarator in &decl.decls {
                        let mut names = Vec::new();
                        collect_pattern_names(&declarator.pattern, &mut names);
                        for name in names {
                            if scope.find(&name).is_some() {
                                self.duplicate_error(&name, stmt.line);
                            } else {
                                scope.add(name, kind);
                            }
                        }
                    }
                }
            }
        }

        // with_depth deliberately carries into nested functions: their scope
        // chain crosses the with frame at runtime, so their free names must
        // also be looked up dynamically.
        self.scopes.push(scope);

        for param in &mut def.params {
            self.resolve_pattern(param, fns);
        }
        if let Some(rest) = &mut def.rest_param {
            self.resolve_pattern(rest, fns);
        }
        match &mut def.body {
            FuncBody::Block(block) => {
                // The body block's lexical bindings already live in the
                // function scope, so its statements resolve directly here.
                let stmts = std::mem::take(&mut block.stmts);
                let mut stmts = stmts;
                for stmt in &mut stmts {
                    self.resolve_stmt(stmt, fns);
                }
                block.stmts = stmts;
            }
            FuncBody::Expr(expr) => self.resolve_expr(expr, fns),
        }

        def.scope = self.scopes.pop().expect("function scope").into_scope_info();
        def.hoisted_fns = hoisted_fns;
        def.self_slot = self_slot;
        fns[func as usize] = def;
    }

    // -- statements --------------------------------------------------------

    fn resolve_block(&mut self, block: &mut Block, fns: &mut Vec<FunctionDef>) {
        let mut scope = PrepScope::new(ScopeKind::Block);
        self.collect_lexical(&block.stmts, &mut scope);
        self.scopes.push(scope);
        for stmt in &mut block.stmts {
            self.resolve_stmt(stmt, fns);
        }
        block.scope = self.scopes.pop().expect("block scope").into_scope_info();
    }

    fn resolve_stmt(&mut self, stmt: &mut Stmt, fns: &mut Vec<FunctionDef>) {
        match &mut stmt.kind {
            StmtKind::Expr(expr) | StmtKind::Throw(expr) => self.resolve_expr(expr, fns),
            StmtKind::VarDecl(decl) => self.resolve_var_decl(decl, fns),
            StmtKind::FunctionDecl { name, func } => {
                self.resolve_name(name);
                self.prep_function(*func, fns);
            }
            StmtKind::Return(expr) => {
                if let Some(expr) = expr {
                    self.resolve_expr(expr, fns);
                }
            }
            StmtKind::If { test, then, otherwise } => {
                self.resolve_expr(test, fns);
                self.resolve_stmt(then, fns);
                if let Some(otherwise) = otherwise {
                    self.resolve_stmt(otherwise, fns);
                }
            }
            StmtKind::Block(block) => self.resolve_block(block, fns),
            StmtKind::Empty | StmtKind::Debugger | StmtKind::Break(_) | StmtKind::Continue(_) => {}
            StmtKind::While { test, body } => {
                self.resolve_expr(test, fns);
                self.resolve_stmt(body, fns);
            }
            StmtKind::DoWhile { body, test } => {
                self.resolve_stmt(body, fns);
                self.resolve_expr(test, fns);
            }
            StmtKind::For {
                init,
                test,
                update,
                body,
                scope,
            } => {
                let mut prep_scope = PrepScope::new(ScopeKind::Block);
                if let Some(ForInit::Decl(decl)) = init {
                    if decl.kind != DeclKind::Var {
                        let kind = if decl.kind == DeclKind::Const {
                            BindKind::Const
                        } else {
                            BindKind::Let
                        };
                        for declarator in &decl.decls {
                            let mut names = Vec::new();
                            collect_pattern_names(&declarator.pattern, &mut names);
                            for name in names {
                                if prep_scope.find(&name).is_some() {
                                    self.duplicate_error(&name, stmt.line);
                                } else {
                                    prep_scope.add(name, kind);
                                }
                            }
                        }
                    }
                }
                self.scopes.push(prep_scope);
                match init {
                    Some(ForInit::Decl(decl)) => self.resolve_var_decl(decl, fns),
                    Some(ForInit::Expr(expr)) => self.resolve_expr(expr, fns),
                    None => {}
                }
                if let Some(test) = test {
                    self.resolve_expr(test, fns);
                }
                if let Some(update) = update {
                    self.resolve_expr(update, fns);
                }
                self.resolve_stmt(body, fns);
                *scope = self.scopes.pop().expect("for scope").into_scope_info();
            }
            StmtKind::ForIn {
                left,
                object: enumerated,
                body,
                scope,
            } => {
                self.resolve_expr(enumerated, fns);
                self.resolve_for_head(left, body, scope, stmt.line, fns);
            }
            StmtKind::ForOf {
                left,
                iterable,
                body,
                scope,
            } => {
                self.resolve_expr(iterable, fns);
                self.resolve_for_head(left, body, scope, stmt.line, fns);
            }
            StmtKind::Switch { disc, cases, scope } => {
                self.resolve_expr(disc, fns);
                let mut prep_scope = PrepScope::new(ScopeKind::Block);
                for case in cases.iter() {
                    self.collect_lexical(&case.body, &mut prep_scope);
                }
                self.scopes.push(prep_scope);
                for case in cases {
                    if let Some(test) = &mut case.test {
                        self.resolve_expr(test, fns);
                    }
                    for stmt in &mut case.body {
                        self.resolve_stmt(stmt, fns);
                    }
                }
                *scope = self.scopes.pop().expect("switch scope").into_scope_info();
            }
            StmtKind::Labeled { body, .. } => self.resolve_stmt(body, fns),
            StmtKind::Try { block, catch, finally } => {
                self.resolve_block(block, fns);
                if let Some(catch) = catch {
                    let mut prep_scope = PrepScope::new(ScopeKind::Block);
                    if let Some(param) = &catch.param {
                        let mut names = Vec::new();
                        collect_pattern_names(param, &mut names);
                        for name in names {
                            prep_scope.add(name, BindKind::CatchParam);
                        }
                    }
                    self.scopes.push(prep_scope);
                    if let Some(param) = &mut catch.param {
                        self.resolve_pattern(param, fns);
                    }
                    self.resolve_block(&mut catch.body, fns);
                    catch.scope = self.scopes.pop().expect("catch scope").into_scope_info();
                }
                if let Some(finally) = finally {
                    self.resolve_block(finally, fns);
                }
            }
            StmtKind::With { object, body } => {
                self.resolve_expr(object, fns);
                self.with_depth += 1;
                self.resolve_stmt(body, fns);
                self.with_depth -= 1;
            }
        }
    }

    fn resolve_for_head(
        &mut self,
        left: &mut ForHead,
        body: &mut Stmt,
        scope: &mut ScopeInfo,
        line: u32,
        fns: &mut Vec<FunctionDef>,
    ) {
        let mut prep_scope = PrepScope::new(ScopeKind::Block);
        if let ForHead::Decl(kind, pattern) = left {
            if *kind != DeclKind::Var {
                let bind_kind = if *kind == DeclKind::Const {
                    BindKind::Const
                } else {
                    BindKind::Let
                };
                let mut names = Vec::new();
                collect_pattern_names(pattern, &mut names);
                for name in names {
                    if prep_scope.find(&name).is_some() {
                        self.duplicate_error(&name, line);
                    } else {
                        prep_scope.add(name, bind_kind);
                    }
                }
            }
        }
        self.scopes.push(prep_scope);
        match left {
            ForHead::Decl(_, pattern) | ForHead::Target(pattern) => self.resolve_pattern(pattern, fns),
        }
        self.resolve_stmt(body, fns);
        *scope = self.scopes.pop().expect("loop scope").into_scope_info();
    }

    fn resolve_var_decl(&mut self, decl: &mut VarDecl, fns: &mut Vec<FunctionDef>) {
        for declarator in &mut decl.decls {
            self.resolve_pattern(&mut declarator.pattern, fns);
            if let Some(init) = &mut declarator.init {
                self.resolve_expr(init, fns);
            }
        }
    }

    fn resolve_pattern(&mut self, pattern: &mut Pattern, fns: &mut Vec<FunctionDef>) {
        if let Some(default) = &mut pattern.default {
            self.resolve_expr(default, fns);
        }
        match &mut pattern.kind {
            PatternKind::Ident(name_ref) => self.resolve_name(name_ref),
            PatternKind::Array { elements, rest } => {
                for element in elements.iter_mut().flatten() {
                    self.resolve_pattern(element, fns);
                }
                if let Some(rest) = rest {
                    self.resolve_pattern(rest, fns);
                }
            }
            PatternKind::Object { props, rest } => {
                for (key, value) in props {
                    if let PropName::Computed(expr) = key {
                        self.resolve_expr(expr, fns);
                    }
                    self.resolve_pattern(value, fns);
                }
                if let Some(rest) = rest {
                    self.resolve_pattern(rest, fns);
                }
            }
            PatternKind::Member { object, property } => {
                self.resolve_expr(object, fns);
                if let MemberKey::Computed(expr) = property {
                    self.resolve_expr(expr, fns);
                }
            }
        }
    }

    fn resolve_assign_target(&mut self, target: &mut AssignTarget, fns: &mut Vec<FunctionDef>) {
        match target {
            AssignTarget::Ident(name_ref) => self.resolve_name(name_ref),
            AssignTarget::Member { object, property } => {
                self.resolve_expr(object, fns);
                if let MemberKey::Computed(expr) = property {
                    self.resolve_expr(expr, fns);
                }
            }
            AssignTarget::Pattern(pattern) => self.resolve_pattern(pattern, fns),
        }
    }

    fn resolve_expr(&mut self, expr: &mut Expr, fns: &mut Vec<FunctionDef>) {
        match &mut expr.kind {
            ExprKind::Number(_)
            | ExprKind::BigInt(_)
            | ExprKind::Str(_)
            | ExprKind::Bool(_)
            | ExprKind::Null
            | ExprKind::Regex { .. }
            | ExprKind::This => {}
            ExprKind::Ident(name_ref) => self.resolve_name(name_ref),
            ExprKind::Array(elements) => {
                for element in elements.iter_mut().flatten() {
                    self.resolve_expr(element, fns);
                }
            }
            ExprKind::Object(props) => {
                for prop in props {
                    match prop {
                        PropInit::KeyValue { key, value } => {
                            if let PropName::Computed(expr) = key {
                                self.resolve_expr(expr, fns);
                            }
                            self.resolve_expr(value, fns);
                        }
                        PropInit::Shorthand(name_ref) => self.resolve_name(name_ref),
                        PropInit::Method { key, func }
                        | PropInit::Getter { key, func }
                        | PropInit::Setter { key, func } => {
                            if let PropName::Computed(expr) = key {
                                self.resolve_expr(expr, fns);
                            }
                            self.prep_function(*func, fns);
                        }
                        PropInit::Spread(expr) => self.resolve_expr(expr, fns),
                    }
                }
            }
            ExprKind::Function(func) | ExprKind::Arrow(func) => {
                self.prep_function(*func, fns);
            }
            ExprKind::Template { exprs, .. } => {
                for expr in exprs {
                    self.resolve_expr(expr, fns);
                }
            }
            ExprKind::Unary { expr, .. } | ExprKind::Spread(expr) | ExprKind::OptionalChain(expr) => {
                self.resolve_expr(expr, fns);
            }
            ExprKind::Update { target, .. } => self.resolve_assign_target(target, fns),
            ExprKind::Binary { left, right, .. } | ExprKind::Logical { left, right, .. } => {
                self.resolve_expr(left, fns);
                self.resolve_expr(right, fns);
            }
            ExprKind::Cond { test, then, otherwise } => {
                self.resolve_expr(test, fns);
                self.resolve_expr(then, fns);
                self.resolve_expr(otherwise, fns);
            }
            ExprKind::Assign { target, value, .. } => {
                self.resolve_assign_target(target, fns);
                self.resolve_expr(value, fns);
            }
            ExprKind::Seq(exprs) => {
                for expr in exprs {
                    self.resolve_expr(expr, fns);
                }
            }
            ExprKind::Call { callee, args, .. } | ExprKind::New { callee, args } => {
                self.resolve_expr(callee, fns);
                for arg in args {
                    self.resolve_expr(arg, fns);
                }
            }
            ExprKind::Member { object, property, .. } => {
                self.resolve_expr(object, fns);
                if let MemberKey::Computed(expr) = property {
                    self.resolve_expr(expr, fns);
                }
            }
        }
    }
}

/// Collects `var` and function declarations from a statement list,
/// recursing into nested statements but not into nested functions.
fn collect_hoisted(stmts: &[Stmt], vars: &mut Vec<(Name, u32)>, fns: &mut Vec<(Name, FuncId, u32)>) {
    for stmt in stmts {
        collect_hoisted_stmt(stmt, vars, fns);
    }
}

fn collect_hoisted_stmt(stmt: &Stmt, vars: &mut Vec<(Name, u32)>, fns: &mut Vec<(Name, FuncId, u32)>) {
    match &stmt.kind {
        StmtKind::VarDecl(decl) if decl.kind == DeclKind::Var => {
            for declarator in &decl.decls {
                let mut names = Vec::new();
                collect_pattern_names(&declarator.pattern, &mut names);
                for name in names {
                    vars.push((name, stmt.line));
                }
            }
        }
        StmtKind::FunctionDecl { name, func } => {
            fns.push((Rc::clone(&name.name), *func, stmt.line));
        }
        StmtKind::Block(block) => collect_hoisted(&block.stmts, vars, fns),
        StmtKind::If { then, otherwise, .. } => {
            collect_hoisted_stmt(then, vars, fns);
            if let Some(otherwise) = otherwise {
                collect_hoisted_stmt(otherwise, vars, fns);
            }
        }
        StmtKind::While { body, .. } | StmtKind::DoWhile { body, .. } | StmtKind::Labeled { body, .. } => {
            collect_hoisted_stmt(body, vars, fns);
        }
        StmtKind::For { init, body, .. } => {
            if let Some(ForInit::Decl(decl)) = init {
                if decl.kind == DeclKind::Var {
                    for declarator in &decl.decls {
                        let mut names = Vec::new();
                        collect_pattern_names(&declarator.pattern, &mut names);
                        for name in names {
                            vars.push((name, stmt.line));
                        }
                    }
                }
            }
            collect_hoisted_stmt(body, vars, fns);
        }
        StmtKind::ForIn { left, body, .. } | StmtKind::ForOf { left, body, .. } => {
            if let ForHead::Decl(DeclKind::Var, pattern) = left {
                let mut names = Vec::new();
                collect_pattern_names(pattern, &mut names);
                for name in names {
                    vars.push((name, stmt.line));
                }
            }
            collect_hoisted_stmt(body, vars, fns);
        }
        StmtKind::Switch { cases, .. } => {
            for case in cases {
                collect_hoisted(&case.body, vars, fns);
            }
        }
        StmtKind::Try { block, catch, finally } => {
            collect_hoisted(&block.stmts, vars, fns);
            if let Some(catch) = catch {
                collect_hoisted(&catch.body.stmts, vars, fns);
            }
            if let Some(finally) = finally {
                collect_hoisted(&finally.stmts, vars, fns);
            }
        }
        StmtKind::With { body, .. } => collect_hoisted_stmt(body, vars, fns),
        _ => {}
    }
}

/// Collects the identifier names a binding pattern introduces.
fn collect_pattern_names(pattern: &Pattern, out: &mut Vec<Name>) {
    match &pattern.kind {
        PatternKind::Ident(name_ref) => out.push(Rc::clone(&name_ref.name)),
        PatternKind::Array { elements, rest } => {
            for element in elements.iter().flatten() {
                collect_pattern_names(element, out);
            }
            if let Some(rest) = rest {
                collect_pattern_names(rest, out);
            }
        }
        PatternKind::Object { props, rest } => {
            for (_, value) in props {
                collect_pattern_names(value, out);
            }
            if let Some(rest) = rest {
                collect_pattern_names(rest, out);
            }
        }
        // Member patterns assign, they do not bind.
        PatternKind::Member { .. } => {}
    }
}

fn dummy_function() -> FunctionDef {
    FunctionDef {
        span: Span::new(0, 0),
        line: 0,
        name: None,
        params: Vec::new(),
        rest_param: None,
        body: FuncBody::Expr(Box::new(Expr {
            span: Span::new(0, 0),
            line: 0,
            kind: ExprKind::Null,
        })),
        scope: ScopeInfo::default(),
        hoisted_fns: Vec::new(),
        self_slot: None,
        is_arrow: false,
        strict: false,
    }
}
