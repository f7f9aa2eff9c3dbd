//! The tree-walking evaluator.
//!
//! Statements evaluate to structured completions: `Normal` falls through,
//! `Return`/`Break`/`Continue` unwind until a construct absorbs them, and
//! `throw` travels on the error channel. `finally` blocks run on every path
//! and an abrupt completion from one overrides whatever was pending.

use std::rc::Rc;

use crate::{
    ast::{
        AssignOp, AssignTarget, Block, CatchClause, Expr, ExprKind, ForHead, ForInit, FuncBody, FuncId, LogicalOp,
        MemberKey, NameRef, Pattern, PatternKind, PropInit, PropName, Resolution, ScopeInfo, Stmt, StmtKind,
        SwitchCase, UnaryOp, UpdateOp,
    },
    context::{CompiledCode, Context},
    env::{EnvKind, Environment, Slot},
    error::{RunError, RunResult, Thrown},
    heap::HeapId,
    intern::Name,
    object::{FunctionData, FunctionKind, JsObject, ObjectData, PropValue, Property, PropertyKey, enumerate_keys},
    ops::{Hint, activation},
    resource::ResourceTracker,
    value::{SYM_ITERATOR, Value, strict_equals},
};

/// Structured completion of a statement.
#[derive(Debug, Clone)]
pub(crate) enum Flow {
    Normal,
    Return(Value),
    Break(Option<Name>),
    Continue(Option<Name>),
}

impl Flow {
    fn is_abrupt(&self) -> bool {
        !matches!(self, Self::Normal)
    }
}

impl<T: ResourceTracker> Context<T> {
    /// Runs a compiled program against the global scope, returning the
    /// completion value.
    pub(crate) fn run_program(&mut self, code: &Rc<CompiledCode>, global: HeapId) -> RunResult<Value> {
        let source: Rc<str> = Rc::from(code.ast.source_name.as_str());
        self.call_stack
            .push(activation(&Rc::from("<top-level>"), &source, 1));
        let result = self.run_program_inner(code, global);
        self.call_stack.pop();
        result
    }

    fn run_program_inner(&mut self, code: &Rc<CompiledCode>, global: HeapId) -> RunResult<Value> {
        // Script frame for top-level let/const.
        let script_env = self
            .heap
            .alloc_env(Environment::from_scope(EnvKind::Script, None, &code.ast.scope))?;

        // Hoisting: top-level vars exist (as undefined) before execution,
        // function declarations are live immediately.
        for name in &code.ast.global_vars {
            let exists = self.heap.object(global).properties.contains_key(&**name);
            if !exists {
                self.heap.object_mut(global).define_data(name, Value::Undefined);
            }
        }
        for (name, func) in &code.ast.global_fns.clone() {
            let value = self.create_function(code, *func, script_env)?;
            self.heap.object_mut(global).define_data(name, value);
        }

        let mut completion = Value::Undefined;
        match self.exec_stmts(&code.ast.body, script_env, code, &mut completion)? {
            Flow::Normal => Ok(completion),
            // Stray return/break/continue at top level were parse errors;
            // absorbing them here keeps the engine robust after recovery.
            _ => Ok(completion),
        }
    }

    // -- statements --------------------------------------------------------

    fn exec_stmts(
        &mut self,
        stmts: &[Stmt],
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        for stmt in stmts {
            let flow = self.exec_stmt(stmt, env, code, completion)?;
            if flow.is_abrupt() {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(
        &mut self,
        stmt: &Stmt,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        if let Some(frame) = self.call_stack.last_mut() {
            frame.line = stmt.line;
        }
        if let Some(hook) = &mut self.interrupt {
            if hook() {
                return Err(RunError::Terminated);
            }
        }
        self.heap.tracker_mut().on_step()?;

        match &stmt.kind {
            StmtKind::Empty | StmtKind::Debugger | StmtKind::FunctionDecl { .. } => Ok(Flow::Normal),
            StmtKind::Expr(expr) => {
                *completion = self.eval_expr(expr, env, code)?;
                Ok(Flow::Normal)
            }
            StmtKind::VarDecl(decl) => {
                self.exec_var_decl(decl, env, code)?;
                Ok(Flow::Normal)
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval_expr(expr, env, code)?,
                    None => Value::Undefined,
                };
                Ok(Flow::Return(value))
            }
            StmtKind::Throw(expr) => {
                let value = self.eval_expr(expr, env, code)?;
                Err(RunError::Throw(Thrown::Value(value)))
            }
            StmtKind::If { test, then, otherwise } => {
                let test = self.eval_expr(test, env, code)?;
                if test.to_boolean() {
                    self.exec_stmt(then, env, code, completion)
                } else if let Some(otherwise) = otherwise {
                    self.exec_stmt(otherwise, env, code, completion)
                } else {
                    Ok(Flow::Normal)
                }
            }
            StmtKind::Block(block) => self.exec_block(block, env, code, completion),
            StmtKind::While { test, body } => self.exec_while(test, body, env, code, completion, None),
            StmtKind::DoWhile { body, test } => self.exec_do_while(body, test, env, code, completion, None),
            StmtKind::For {
                init,
                test,
                update,
                body,
                scope,
            } => self.exec_for(init.as_ref(), test.as_ref(), update.as_ref(), body, scope, env, code, completion, None),
            StmtKind::ForIn {
                left,
                object,
                body,
                scope,
            } => self.exec_for_in(left, object, body, scope, env, code, completion, None),
            StmtKind::ForOf {
                left,
                iterable,
                body,
                scope,
            } => self.exec_for_of(left, iterable, body, scope, env, code, completion, None),
            StmtKind::Switch { disc, cases, scope } => self.exec_switch(disc, cases, scope, env, code, completion),
            StmtKind::Break(label) => Ok(Flow::Break(label.clone())),
            StmtKind::Continue(label) => Ok(Flow::Continue(label.clone())),
            StmtKind::Labeled { label, body } => self.exec_labeled(label, body, env, code, completion),
            StmtKind::Try { block, catch, finally } => {
                self.exec_try(block, catch.as_ref(), finally.as_ref(), env, code, completion)
            }
            StmtKind::With { object, body } => {
                let object = self.eval_expr(object, env, code)?;
                let object_id = self.to_object_value(&object)?;
                let with_env = self.heap.alloc_env(Environment::with_frame(Some(env), object_id))?;
                self.exec_stmt(body, with_env, code, completion)
            }
        }
    }

    fn exec_block(
        &mut self,
        block: &Block,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        let block_env = if block.scope.is_empty() {
            env
        } else {
            self.new_env(EnvKind::Block, Some(env), &block.scope)?
        };
        self.exec_stmts(&block.stmts, block_env, code, completion)
    }

    fn exec_labeled(
        &mut self,
        label: &Name,
        body: &Stmt,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        let flow = match &body.kind {
            StmtKind::While { test, body } => self.exec_while(test, body, env, code, completion, Some(label))?,
            StmtKind::DoWhile { body, test } => self.exec_do_while(body, test, env, code, completion, Some(label))?,
            StmtKind::For {
                init,
                test,
                update,
                body,
                scope,
            } => self.exec_for(
                init.as_ref(),
                test.as_ref(),
                update.as_ref(),
                body,
                scope,
                env,
                code,
                completion,
                Some(label),
            )?,
            StmtKind::ForIn {
                left,
                object,
                body,
                scope,
            } => self.exec_for_in(left, object, body, scope, env, code, completion, Some(label))?,
            StmtKind::ForOf {
                left,
                iterable,
                body,
                scope,
            } => self.exec_for_of(left, iterable, body, scope, env, code, completion, Some(label))?,
            _ => self.exec_stmt(body, env, code, completion)?,
        };
        match flow {
            Flow::Break(Some(l)) if l == *label => Ok(Flow::Normal),
            other => Ok(other),
        }
    }

    /// Whether a loop with `label` absorbs this completion: unlabeled
    /// break/continue, or ones naming this loop's label.
    fn loop_absorbs(flow: &Flow, label: Option<&Name>) -> LoopSignal {
        match flow {
            Flow::Break(None) => LoopSignal::Break,
            Flow::Continue(None) => LoopSignal::Continue,
            Flow::Break(Some(l)) if label.is_some_and(|mine| mine == l) => LoopSignal::Break,
            Flow::Continue(Some(l)) if label.is_some_and(|mine| mine == l) => LoopSignal::Continue,
            Flow::Normal => LoopSignal::Continue,
            _ => LoopSignal::Propagate,
        }
    }

    fn exec_while(
        &mut self,
        test: &Expr,
        body: &Stmt,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
        label: Option<&Name>,
    ) -> RunResult<Flow> {
        loop {
            let test_value = self.eval_expr(test, env, code)?;
            if !test_value.to_boolean() {
                return Ok(Flow::Normal);
            }
            let flow = self.exec_stmt(body, env, code, completion)?;
            match Self::loop_absorbs(&flow, label) {
                LoopSignal::Break => return Ok(Flow::Normal),
                LoopSignal::Continue => {}
                LoopSignal::Propagate => return Ok(flow),
            }
        }
    }

    fn exec_do_while(
        &mut self,
        body: &Stmt,
        test: &Expr,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
        label: Option<&Name>,
    ) -> RunResult<Flow> {
        loop {
            let flow = self.exec_stmt(body, env, code, completion)?;
            match Self::loop_absorbs(&flow, label) {
                LoopSignal::Break => return Ok(Flow::Normal),
                LoopSignal::Continue => {}
                LoopSignal::Propagate => return Ok(flow),
            }
            let test_value = self.eval_expr(test, env, code)?;
            if !test_value.to_boolean() {
                return Ok(Flow::Normal);
            }
        }
    }

    #[expect(clippy::too_many_arguments, reason = "loop heads carry many clauses")]
    fn exec_for(
        &mut self,
        init: Option<&ForInit>,
        test: Option<&Expr>,
        update: Option<&Expr>,
        body: &Stmt,
        scope: &ScopeInfo,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
        label: Option<&Name>,
    ) -> RunResult<Flow> {
        let loop_env = if scope.is_empty() {
            env
        } else {
            self.new_env(EnvKind::Block, Some(env), scope)?
        };
        match init {
            Some(ForInit::Decl(decl)) => self.exec_var_decl(decl, loop_env, code)?,
            Some(ForInit::Expr(expr)) => {
                self.eval_expr(expr, loop_env, code)?;
            }
            None => {}
        }
        loop {
            if let Some(test) = test {
                let test_value = self.eval_expr(test, loop_env, code)?;
                if !test_value.to_boolean() {
                    return Ok(Flow::Normal);
                }
            }
            let flow = self.exec_stmt(body, loop_env, code, completion)?;
            match Self::loop_absorbs(&flow, label) {
                LoopSignal::Break => return Ok(Flow::Normal),
                LoopSignal::Continue => {}
                LoopSignal::Propagate => return Ok(flow),
            }
            if let Some(update) = update {
                self.eval_expr(update, loop_env, code)?;
            }
        }
    }

    /// Keys visible to `for…in`: property-map enumeration for ordinary
    /// objects, indices for arrays and host lists, member names for host
    /// wrappers.
    fn for_in_keys(&mut self, target: &Value) -> RunResult<Vec<Rc<str>>> {
        let Value::Object(id) = target else {
            return Ok(Vec::new());
        };
        match &self.heap.object(*id).data {
            ObjectData::Host { class, .. } => {
                let registry = Rc::clone(&self.host);
                let members = registry.members(*class);
                let mut keys: Vec<Rc<str>> = members.instance.keys().map(Rc::clone).collect();
                keys.sort();
                Ok(keys)
            }
            ObjectData::HostList(list) => Ok((0..list.borrow().len()).map(|i| Rc::from(i.to_string())).collect()),
            _ => Ok(enumerate_keys(&self.heap, *id)),
        }
    }

    #[expect(clippy::too_many_arguments, reason = "loop heads carry many clauses")]
    fn exec_for_in(
        &mut self,
        left: &ForHead,
        object: &Expr,
        body: &Stmt,
        scope: &ScopeInfo,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
        label: Option<&Name>,
    ) -> RunResult<Flow> {
        let target = self.eval_expr(object, env, code)?;
        if target.is_nullish() {
            return Ok(Flow::Normal);
        }
        let keys = self.for_in_keys(&target)?;
        for key in keys {
            let iter_env = if scope.is_empty() {
                env
            } else {
                self.new_env(EnvKind::Block, Some(env), scope)?
            };
            self.bind_for_head(left, Value::str(&*key), iter_env, code)?;
            let flow = self.exec_stmt(body, iter_env, code, completion)?;
            match Self::loop_absorbs(&flow, label) {
                LoopSignal::Break => return Ok(Flow::Normal),
                LoopSignal::Continue => {}
                LoopSignal::Propagate => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    #[expect(clippy::too_many_arguments, reason = "loop heads carry many clauses")]
    fn exec_for_of(
        &mut self,
        left: &ForHead,
        iterable: &Expr,
        body: &Stmt,
        scope: &ScopeInfo,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
        label: Option<&Name>,
    ) -> RunResult<Flow> {
        let target = self.eval_expr(iterable, env, code)?;
        let iterator = self.get_iterator(&target)?;
        loop {
            let next = match self.iterator_next(&iterator) {
                Ok(next) => next,
                Err(err) => return Err(err),
            };
            let Some(value) = next else {
                return Ok(Flow::Normal);
            };
            let iter_env = if scope.is_empty() {
                env
            } else {
                self.new_env(EnvKind::Block, Some(env), scope)?
            };
            if let Err(err) = self.bind_for_head(left, value, iter_env, code) {
                self.iterator_close(&iterator);
                return Err(err);
            }
            let flow = match self.exec_stmt(body, iter_env, code, completion) {
                Ok(flow) => flow,
                Err(err) => {
                    // Abnormal exit must close the iterator.
                    self.iterator_close(&iterator);
                    return Err(err);
                }
            };
            match Self::loop_absorbs(&flow, label) {
                LoopSignal::Break => {
                    self.iterator_close(&iterator);
                    return Ok(Flow::Normal);
                }
                LoopSignal::Continue => {}
                LoopSignal::Propagate => {
                    self.iterator_close(&iterator);
                    return Ok(flow);
                }
            }
        }
    }

    fn bind_for_head(&mut self, left: &ForHead, value: Value, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<()> {
        match left {
            ForHead::Decl(_, pattern) => self.bind_pattern(pattern, value, env, code, true),
            ForHead::Target(pattern) => self.bind_pattern(pattern, value, env, code, false),
        }
    }

    fn exec_switch(
        &mut self,
        disc: &Expr,
        cases: &[SwitchCase],
        scope: &ScopeInfo,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        let disc = self.eval_expr(disc, env, code)?;
        let switch_env = if scope.is_empty() {
            env
        } else {
            self.new_env(EnvKind::Block, Some(env), scope)?
        };

        // Find the matching case (or default) before running any bodies.
        let mut start = None;
        for (index, case) in cases.iter().enumerate() {
            if let Some(test) = &case.test {
                let test_value = self.eval_expr(test, switch_env, code)?;
                if strict_equals(&disc, &test_value) {
                    start = Some(index);
                    break;
                }
            }
        }
        if start.is_none() {
            start = cases.iter().position(|case| case.test.is_none());
        }
        let Some(start) = start else {
            return Ok(Flow::Normal);
        };

        for case in &cases[start..] {
            let flow = self.exec_stmts(&case.body, switch_env, code, completion)?;
            match flow {
                Flow::Normal => {}
                Flow::Break(None) => return Ok(Flow::Normal),
                other => return Ok(other),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_try(
        &mut self,
        block: &Block,
        catch: Option<&CatchClause>,
        finally: Option<&Block>,
        env: HeapId,
        code: &Rc<CompiledCode>,
        completion: &mut Value,
    ) -> RunResult<Flow> {
        let mut outcome = self.exec_block(block, env, code, completion);

        if let Err(err) = &outcome {
            if err.is_catchable() {
                if let Some(catch) = catch {
                    let error_value = match err {
                        RunError::Throw(Thrown::Value(value)) => value.clone(),
                        RunError::Throw(Thrown::Native(native)) => {
                            let native = native.clone();
                            self.create_error_object(&native)?
                        }
                        RunError::Terminated => unreachable!("terminated is not catchable"),
                    };
                    let catch_env = if catch.scope.is_empty() {
                        env
                    } else {
                        self.new_env(EnvKind::Block, Some(env), &catch.scope)?
                    };
                    outcome = (|| {
                        if let Some(param) = &catch.param {
                            self.bind_pattern(param, error_value, catch_env, code, true)?;
                        }
                        self.exec_block(&catch.body, catch_env, code, completion)
                    })();
                }
            }
        }

        if let Some(finally) = finally {
            // finally runs on every path; its abrupt completion overrides a
            // pending one, including a pending throw.
            let fin = self.exec_block(finally, env, code, completion)?;
            if fin.is_abrupt() {
                return Ok(fin);
            }
        }
        outcome
    }

    fn exec_var_decl(&mut self, decl: &crate::ast::VarDecl, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<()> {
        for declarator in &decl.decls {
            let value = match &declarator.init {
                Some(init) => self.eval_expr(init, env, code)?,
                None => Value::Undefined,
            };
            // A declaration without initializer still initializes lexical
            // bindings (ends the dead zone with undefined).
            self.bind_pattern(&declarator.pattern, value, env, code, true)?;
        }
        Ok(())
    }

    // -- patterns ----------------------------------------------------------

    /// Binds `value` to a pattern. `declare` initializes bindings (ending
    /// the TDZ); otherwise this is a destructuring assignment.
    pub(crate) fn bind_pattern(
        &mut self,
        pattern: &Pattern,
        value: Value,
        env: HeapId,
        code: &Rc<CompiledCode>,
        declare: bool,
    ) -> RunResult<()> {
        let value = if matches!(value, Value::Undefined) {
            match &pattern.default {
                Some(default) => self.eval_expr(default, env, code)?,
                None => value,
            }
        } else {
            value
        };
        match &pattern.kind {
            PatternKind::Ident(name_ref) => self.write_name(name_ref, env, value, declare),
            PatternKind::Member { object, property } => {
                let base = self.eval_expr(object, env, code)?;
                let key = self.member_key(property, env, code)?;
                self.put_member(&base, &key, value)
            }
            PatternKind::Array { elements, rest } => {
                let iterator = self.get_iterator(&value)?;
                let mut exhausted = false;
                for element in elements {
                    let item = if exhausted {
                        Value::Undefined
                    } else {
                        match self.iterator_next(&iterator)? {
                            Some(item) => item,
                            None => {
                                exhausted = true;
                                Value::Undefined
                            }
                        }
                    };
                    if let Some(element) = element {
                        self.bind_pattern(element, item, env, code, declare)?;
                    }
                }
                if let Some(rest) = rest {
                    let mut remaining = Vec::new();
                    while let Some(item) = self.iterator_next(&iterator)? {
                        remaining.push(item);
                    }
                    let rest_value = self.new_array(remaining)?;
                    self.bind_pattern(rest, rest_value, env, code, declare)?;
                } else if !exhausted {
                    self.iterator_close(&iterator);
                }
                Ok(())
            }
            PatternKind::Object { props, rest } => {
                if value.is_nullish() {
                    return Err(self.type_error("Cannot destructure undefined or null"));
                }
                let mut taken: Vec<Rc<str>> = Vec::new();
                for (key, sub) in props {
                    let key = self.prop_name_key(key, env, code)?;
                    if let PropertyKey::Str(name) = &key {
                        taken.push(Rc::clone(name));
                    }
                    let item = self.get_member(&value, &key)?;
                    self.bind_pattern(sub, item, env, code, declare)?;
                }
                if let Some(rest) = rest {
                    let rest_id = self.new_object()?;
                    if let Value::Object(source) = &value {
                        let keys: Vec<Rc<str>> = self
                            .heap
                            .object(*source)
                            .properties
                            .iter()
                            .filter(|(name, prop)| prop.enumerable && !taken.iter().any(|t| t == *name))
                            .map(|(name, _)| Rc::clone(name))
                            .collect();
                        for name in keys {
                            let item = self.get_member(&value, &PropertyKey::Str(Rc::clone(&name)))?;
                            self.heap.object_mut(rest_id).define_data(&name, item);
                        }
                    }
                    self.bind_pattern(rest, Value::Object(rest_id), env, code, declare)?;
                }
                Ok(())
            }
        }
    }

    // -- name access -------------------------------------------------------

    fn walk_env(&self, env: HeapId, hops: u16) -> HeapId {
        let mut current = env;
        for _ in 0..hops {
            current = self.heap.env(current).parent.expect("environment chain too short");
        }
        current
    }

    pub(crate) fn read_name(&mut self, name_ref: &NameRef, env: HeapId) -> RunResult<Value> {
        match name_ref.res {
            Resolution::Slot { hops, index } => {
                let frame = self.walk_env(env, hops);
                match &self.heap.env(frame).slots[index as usize] {
                    Slot::Value(value) => Ok(value.clone()),
                    Slot::Uninitialized => {
                        let name = Rc::clone(&name_ref.name);
                        Err(self.reference_error(format!("Cannot access \"{name}\" before initialization")))
                    }
                }
            }
            Resolution::Global => self.read_global(&name_ref.name),
            Resolution::Dynamic => self.dynamic_get(env, &name_ref.name),
            Resolution::Unresolved => {
                let name = Rc::clone(&name_ref.name);
                Err(self.raise(crate::error::ErrorKind::Evaluator, format!("unresolved name \"{name}\"")))
            }
        }
    }

    fn read_global(&mut self, name: &Name) -> RunResult<Value> {
        let global = self.global_id();
        let key = PropertyKey::Str(Rc::clone(name).into());
        if self.has_property_value(&Value::Object(global), &key)? {
            self.get_member(&Value::Object(global), &key)
        } else {
            Err(self.reference_error(format!("\"{name}\" is not defined")))
        }
    }

    /// Like [`Context::read_name`] but yields `undefined` for missing
    /// globals, the `typeof` carve-out.
    fn read_name_for_typeof(&mut self, name_ref: &NameRef, env: HeapId) -> RunResult<Value> {
        match name_ref.res {
            Resolution::Global => {
                let global = self.global_id();
                let key = PropertyKey::Str(Rc::clone(&name_ref.name).into());
                if self.has_property_value(&Value::Object(global), &key)? {
                    self.get_member(&Value::Object(global), &key)
                } else {
                    Ok(Value::Undefined)
                }
            }
            Resolution::Dynamic => match self.dynamic_get(env, &name_ref.name) {
                Ok(value) => Ok(value),
                Err(_) => Ok(Value::Undefined),
            },
            _ => self.read_name(name_ref, env),
        }
    }

    pub(crate) fn write_name(&mut self, name_ref: &NameRef, env: HeapId, value: Value, init: bool) -> RunResult<()> {
        match name_ref.res {
            Resolution::Slot { hops, index } => {
                let frame = self.walk_env(env, hops);
                let index = index as usize;
                if !init {
                    let (kind, initialized) = {
                        let frame_ref = self.heap.env(frame);
                        (
                            frame_ref.names[index].1,
                            matches!(frame_ref.slots[index], Slot::Value(_)),
                        )
                    };
                    if kind.is_const() && initialized {
                        return Err(self.type_error("Assignment to constant variable."));
                    }
                    if !initialized {
                        let name = Rc::clone(&name_ref.name);
                        return Err(self.reference_error(format!("Cannot access \"{name}\" before initialization")));
                    }
                }
                self.heap.env_mut(frame).slots[index] = Slot::Value(value);
                Ok(())
            }
            Resolution::Global => {
                let global = self.global_id();
                let key = PropertyKey::Str(Rc::clone(&name_ref.name).into());
                self.put_member(&Value::Object(global), &key, value)
            }
            Resolution::Dynamic => self.dynamic_set(env, &name_ref.name, value),
            Resolution::Unresolved => {
                let name = Rc::clone(&name_ref.name);
                Err(self.raise(crate::error::ErrorKind::Evaluator, format!("unresolved name \"{name}\"")))
            }
        }
    }

    /// By-name lookup through the frame chain, consulting `with` objects.
    fn dynamic_get(&mut self, env: HeapId, name: &Name) -> RunResult<Value> {
        let mut current = Some(env);
        while let Some(frame_id) = current {
            let (kind, slot_index, parent) = {
                let frame = self.heap.env(frame_id);
                (frame.kind.clone(), frame.slot_index(name), frame.parent)
            };
            if let EnvKind::With { object } = kind {
                let key = PropertyKey::Str(Rc::clone(name).into());
                if self.has_property_value(&Value::Object(object), &key)? {
                    return self.get_member(&Value::Object(object), &key);
                }
            } else if let Some(index) = slot_index {
                return match &self.heap.env(frame_id).slots[index] {
                    Slot::Value(value) => Ok(value.clone()),
                    Slot::Uninitialized => {
                        let name = Rc::clone(name);
                        Err(self.reference_error(format!("Cannot access \"{name}\" before initialization")))
                    }
                };
            }
            current = parent;
        }
        self.read_global(name)
    }

    fn dynamic_set(&mut self, env: HeapId, name: &Name, value: Value) -> RunResult<()> {
        let mut current = Some(env);
        while let Some(frame_id) = current {
            let (kind, slot_index, parent) = {
                let frame = self.heap.env(frame_id);
                (frame.kind.clone(), frame.slot_index(name), frame.parent)
            };
            if let EnvKind::With { object } = kind {
                let key = PropertyKey::Str(Rc::clone(name).into());
                if self.has_property_value(&Value::Object(object), &key)? {
                    return self.put_member(&Value::Object(object), &key, value);
                }
            } else if let Some(index) = slot_index {
                let kind = self.heap.env(frame_id).names[index].1;
                if kind.is_const() {
                    return Err(self.type_error("Assignment to constant variable."));
                }
                self.heap.env_mut(frame_id).slots[index] = Slot::Value(value);
                return Ok(());
            }
            current = parent;
        }
        let global = self.global_id();
        let key = PropertyKey::Str(Rc::clone(name).into());
        self.put_member(&Value::Object(global), &key, value)
    }

    /// The `this` of the nearest non-arrow activation.
    fn this_value(&self, env: HeapId) -> Value {
        let mut current = Some(env);
        while let Some(frame_id) = current {
            let frame = self.heap.env(frame_id);
            match &frame.kind {
                EnvKind::Function { this_val } => return this_val.clone(),
                EnvKind::Script => return self.global.map_or(Value::Undefined, Value::Object),
                _ => current = frame.parent,
            }
        }
        self.global.map_or(Value::Undefined, Value::Object)
    }

    // -- expressions -------------------------------------------------------

    pub(crate) fn eval_expr(&mut self, expr: &Expr, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Value> {
        match &expr.kind {
            ExprKind::Number(n) => Ok(Value::number(*n)),
            ExprKind::BigInt(b) => Ok(Value::BigInt(Rc::clone(b))),
            ExprKind::Str(s) => Ok(Value::str(Rc::clone(s))),
            ExprKind::Bool(b) => Ok(Value::bool(*b)),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Regex { source, flags } => crate::builtins::regexp::create_regexp(self, source, flags),
            ExprKind::Ident(name_ref) => self.read_name(name_ref, env),
            ExprKind::This => Ok(self.this_value(env)),
            ExprKind::Array(elements) => self.eval_array_literal(elements, env, code),
            ExprKind::Object(props) => self.eval_object_literal(props, env, code),
            ExprKind::Function(func) | ExprKind::Arrow(func) => self.create_function(code, *func, env),
            ExprKind::Template { quasis, exprs } => {
                let mut out = String::new();
                out.push_str(&quasis[0]);
                for (expr, quasi) in exprs.iter().zip(&quasis[1..]) {
                    let value = self.eval_expr(expr, env, code)?;
                    let rendered = self.to_js_string(&value)?;
                    out.push_str(rendered.as_str());
                    out.push_str(quasi);
                }
                Ok(Value::str(out))
            }
            ExprKind::Unary { op, expr: operand } => self.eval_unary(*op, operand, env, code),
            ExprKind::Update { op, prefix, target } => self.eval_update(*op, *prefix, target, env, code),
            ExprKind::Binary { op, left, right } => {
                let left = self.eval_expr(left, env, code)?;
                let right = self.eval_expr(right, env, code)?;
                self.binary_op(*op, &left, &right)
            }
            ExprKind::Logical { op, left, right } => {
                let left_value = self.eval_expr(left, env, code)?;
                let take_right = match op {
                    LogicalOp::And => left_value.to_boolean(),
                    LogicalOp::Or => !left_value.to_boolean(),
                    LogicalOp::Nullish => left_value.is_nullish(),
                };
                if take_right {
                    self.eval_expr(right, env, code)
                } else {
                    Ok(left_value)
                }
            }
            ExprKind::Cond { test, then, otherwise } => {
                let test = self.eval_expr(test, env, code)?;
                if test.to_boolean() {
                    self.eval_expr(then, env, code)
                } else {
                    self.eval_expr(otherwise, env, code)
                }
            }
            ExprKind::Assign { op, target, value } => self.eval_assign(*op, target, value, env, code),
            ExprKind::Seq(exprs) => {
                let mut last = Value::Undefined;
                for expr in exprs {
                    last = self.eval_expr(expr, env, code)?;
                }
                Ok(last)
            }
            ExprKind::Member { .. } | ExprKind::Call { .. } => {
                Ok(self.eval_optional(expr, env, code)?.unwrap_or(Value::Undefined))
            }
            ExprKind::OptionalChain(inner) => {
                Ok(self.eval_optional(inner, env, code)?.unwrap_or(Value::Undefined))
            }
            ExprKind::New { callee, args } => {
                let func = self.eval_expr(callee, env, code)?;
                let args = self.eval_args(args, env, code)?;
                self.construct_value(&func, args)
            }
            ExprKind::Spread(_) => Err(self.raise(
                crate::error::ErrorKind::Evaluator,
                "spread is only valid in call arguments and array literals",
            )),
        }
    }

    /// Member/call chains. `Ok(None)` means an optional link found a
    /// nullish base and the chain short-circuits without evaluating its
    /// tail.
    fn eval_optional(&mut self, expr: &Expr, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Option<Value>> {
        match &expr.kind {
            ExprKind::Member {
                object,
                property,
                optional,
            } => {
                let Some(base) = self.eval_optional(object, env, code)? else {
                    return Ok(None);
                };
                if *optional && base.is_nullish() {
                    return Ok(None);
                }
                let key = self.member_key(property, env, code)?;
                self.get_member(&base, &key).map(Some)
            }
            ExprKind::Call { callee, args, optional } => {
                let (func, this, callee_desc) = match &callee.kind {
                    ExprKind::Member {
                        object,
                        property,
                        optional: member_optional,
                    } => {
                        let Some(base) = self.eval_optional(object, env, code)? else {
                            return Ok(None);
                        };
                        if *member_optional && base.is_nullish() {
                            return Ok(None);
                        }
                        let key = self.member_key(property, env, code)?;
                        let func = self.get_member(&base, &key)?;
                        (func, base, key.to_string())
                    }
                    ExprKind::Ident(name_ref) => {
                        let func = self.read_name(name_ref, env)?;
                        (func, Value::Undefined, name_ref.name.to_string())
                    }
                    _ => {
                        let Some(func) = self.eval_optional(callee, env, code)? else {
                            return Ok(None);
                        };
                        (func, Value::Undefined, "expression".to_owned())
                    }
                };
                if *optional && func.is_nullish() {
                    return Ok(None);
                }
                let args = self.eval_args(args, env, code)?;
                if !matches!(&func, Value::Object(id) if self.heap.object(*id).is_callable()) {
                    return Err(self.type_error(format!("{callee_desc} is not a function")));
                }
                self.call_value(&func, this, args).map(Some)
            }
            ExprKind::OptionalChain(inner) => {
                let value = self.eval_optional(inner, env, code)?.unwrap_or(Value::Undefined);
                Ok(Some(value))
            }
            _ => self.eval_expr(expr, env, code).map(Some),
        }
    }

    pub(crate) fn member_key(
        &mut self,
        property: &MemberKey,
        env: HeapId,
        code: &Rc<CompiledCode>,
    ) -> RunResult<PropertyKey> {
        match property {
            MemberKey::Static(name) => Ok(PropertyKey::Str(Rc::clone(name).into())),
            MemberKey::Computed(expr) => {
                let value = self.eval_expr(expr, env, code)?;
                self.to_property_key(&value)
            }
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Vec<Value>> {
        let mut out = Vec::with_capacity(args.len());
        for arg in args {
            if let ExprKind::Spread(inner) = &arg.kind {
                let value = self.eval_expr(inner, env, code)?;
                self.spread_into(&value, &mut out)?;
            } else {
                out.push(self.eval_expr(arg, env, code)?);
            }
        }
        Ok(out)
    }

    /// Spreads an iterable into `out`, with a fast path for plain arrays.
    fn spread_into(&mut self, value: &Value, out: &mut Vec<Value>) -> RunResult<()> {
        if let Value::Object(id) = value {
            if let ObjectData::Array(elements) = &self.heap.object(*id).data {
                out.extend(elements.iter().cloned());
                return Ok(());
            }
        }
        let iterator = self.get_iterator(value)?;
        while let Some(item) = self.iterator_next(&iterator)? {
            out.push(item);
        }
        Ok(())
    }

    fn eval_array_literal(&mut self, elements: &[Option<Expr>], env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Value> {
        let mut values = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                None => values.push(Value::Undefined),
                Some(Expr {
                    kind: ExprKind::Spread(inner),
                    ..
                }) => {
                    let value = self.eval_expr(inner, env, code)?;
                    self.spread_into(&value, &mut values)?;
                }
                Some(expr) => values.push(self.eval_expr(expr, env, code)?),
            }
        }
        self.new_array(values)
    }

    fn prop_name_key(&mut self, key: &PropName, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<PropertyKey> {
        Ok(match key {
            PropName::Ident(name) => PropertyKey::Str(Rc::clone(name).into()),
            PropName::Str(s) => PropertyKey::Str(Rc::clone(s)),
            PropName::Num(n) => PropertyKey::Str(Rc::from(crate::value::format_number(*n))),
            PropName::Computed(expr) => {
                let value = self.eval_expr(expr, env, code)?;
                self.to_property_key(&value)?
            }
        })
    }

    fn eval_object_literal(&mut self, props: &[PropInit], env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Value> {
        let id = self.new_object()?;
        for prop in props {
            match prop {
                PropInit::KeyValue { key, value } => {
                    let key = self.prop_name_key(key, env, code)?;
                    let value = self.eval_expr(value, env, code)?;
                    self.heap.object_mut(id).insert_property(key, Property::data(value));
                }
                PropInit::Shorthand(name_ref) => {
                    let value = self.read_name(name_ref, env)?;
                    let key = PropertyKey::Str(Rc::clone(&name_ref.name).into());
                    self.heap.object_mut(id).insert_property(key, Property::data(value));
                }
                PropInit::Method { key, func } => {
                    let key = self.prop_name_key(key, env, code)?;
                    let value = self.create_function(code, *func, env)?;
                    self.heap.object_mut(id).insert_property(key, Property::data(value));
                }
                PropInit::Getter { key, func } | PropInit::Setter { key, func } => {
                    let is_getter = matches!(prop, PropInit::Getter { .. });
                    let key = self.prop_name_key(key, env, code)?;
                    let value = self.create_function(code, *func, env)?;
                    let Value::Object(func_id) = value else {
                        unreachable!("create_function returns an object");
                    };
                    let obj = self.heap.object_mut(id);
                    let existing = obj.own_property_mut(&key);
                    match existing {
                        Some(Property {
                            value: PropValue::Accessor { get, set },
                            ..
                        }) => {
                            if is_getter {
                                *get = Some(func_id);
                            } else {
                                *set = Some(func_id);
                            }
                        }
                        _ => {
                            let prop = if is_getter {
                                Property::accessor(Some(func_id), None)
                            } else {
                                Property::accessor(None, Some(func_id))
                            };
                            obj.insert_property(key, prop);
                        }
                    }
                }
                PropInit::Spread(expr) => {
                    let source = self.eval_expr(expr, env, code)?;
                    if let Value::Object(source_id) = &source {
                        let keys: Vec<PropertyKey> = self
                            .heap
                            .object(*source_id)
                            .properties
                            .iter()
                            .filter(|(_, p)| p.enumerable)
                            .map(|(name, _)| PropertyKey::Str(Rc::clone(name)))
                            .collect();
                        for key in keys {
                            let value = self.get_member(&source, &key)?;
                            self.heap.object_mut(id).insert_property(key, Property::data(value));
                        }
                    }
                }
            }
        }
        Ok(Value::Object(id))
    }

    fn eval_unary(&mut self, op: UnaryOp, operand: &Expr, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Value> {
        match op {
            UnaryOp::Typeof => {
                let value = match &operand.kind {
                    ExprKind::Ident(name_ref) => self.read_name_for_typeof(name_ref, env)?,
                    _ => self.eval_expr(operand, env, code)?,
                };
                Ok(Value::str(self.type_of(&value)))
            }
            UnaryOp::Delete => match &operand.kind {
                ExprKind::Member {
                    object,
                    property,
                    optional: false,
                } => {
                    let base = self.eval_expr(object, env, code)?;
                    let key = self.member_key(property, env, code)?;
                    let deleted = self.delete_member(&base, &key)?;
                    Ok(Value::bool(deleted))
                }
                _ => {
                    self.eval_expr(operand, env, code)?;
                    Ok(Value::bool(true))
                }
            },
            UnaryOp::Void => {
                self.eval_expr(operand, env, code)?;
                Ok(Value::Undefined)
            }
            UnaryOp::Not => {
                let value = self.eval_expr(operand, env, code)?;
                Ok(Value::bool(!value.to_boolean()))
            }
            UnaryOp::Neg => {
                let value = self.eval_expr(operand, env, code)?;
                let prim = self.to_primitive(&value, Hint::Number)?;
                if let Value::BigInt(b) = &prim {
                    return Ok(Value::BigInt(Rc::new(-(**b).clone())));
                }
                Ok(Value::number(-prim.to_number_prim()?))
            }
            UnaryOp::Pos => {
                let value = self.eval_expr(operand, env, code)?;
                Ok(Value::number(self.to_number_value(&value)?))
            }
            UnaryOp::BitNot => {
                let value = self.eval_expr(operand, env, code)?;
                let prim = self.to_primitive(&value, Hint::Number)?;
                if let Value::BigInt(b) = &prim {
                    return Ok(Value::BigInt(Rc::new(!(**b).clone())));
                }
                Ok(Value::number(f64::from(!crate::value::to_int32(
                    prim.to_number_prim()?,
                ))))
            }
        }
    }

    fn read_target(&mut self, target: &AssignTarget, env: HeapId, code: &Rc<CompiledCode>) -> RunResult<Value> {
        match target {
            AssignTarget::Ident(name_ref) => self.read_name(name_ref, env),
            AssignTarget::Member { object, property } => {
                let base = self.eval_expr(object, env, code)?;
                let key = self.member_key(property, env, code)?;
                self.get_member(&base, &key)
            }
            AssignTarget::Pattern(_) => Err(self.type_error("cannot read a destructuring target")),
        }
    }

    fn write_target(
        &mut self,
        target: &AssignTarget,
        value: Value,
        env: HeapId,
        code: &Rc<CompiledCode>,
    ) -> RunResult<()> {
        match target {
            AssignTarget::Ident(name_ref) => self.write_name(name_ref, env, value, false),
            AssignTarget::Member { object, property } => {
                let base = self.eval_expr(object, env, code)?;
                let key = self.member_key(property, env, code)?;
                self.put_member(&base, &key, value)
            }
            AssignTarget::Pattern(pattern) => self.bind_pattern(pattern, value, env, code, false),
        }
    }

    fn eval_update(
        &mut self,
        op: UpdateOp,
        prefix: bool,
        target: &AssignTarget,
        env: HeapId,
        code: &Rc<CompiledCode>,
    ) -> RunResult<Value> {
        let old = self.read_target(target, env, code)?;
        let old_prim = self.to_primitive(&old, Hint::Number)?;
        if let Value::BigInt(b) = &old_prim {
            let one = num_bigint::BigInt::from(1);
            let new = match op {
                UpdateOp::Inc => &**b + one,
                UpdateOp::Dec => &**b - one,
            };
            let new_value = Value::BigInt(Rc::new(new));
            self.write_target(target, new_value.clone(), env, code)?;
            return Ok(if prefix { new_value } else { old_prim });
        }
        let old_number = old_prim.to_number_prim()?;
        let new_number = match op {
            UpdateOp::Inc => old_number + 1.0,
            UpdateOp::Dec => old_number - 1.0,
        };
        self.write_target(target, Value::number(new_number), env, code)?;
        Ok(Value::number(if prefix { new_number } else { old_number }))
    }

    fn eval_assign(
        &mut self,
        op: AssignOp,
        target: &AssignTarget,
        value: &Expr,
        env: HeapId,
        code: &Rc<CompiledCode>,
    ) -> RunResult<Value> {
        match op {
            AssignOp::Assign => {
                let value = self.eval_expr(value, env, code)?;
                self.write_target(target, value.clone(), env, code)?;
                Ok(value)
            }
            AssignOp::And | AssignOp::Or | AssignOp::Nullish => {
                let current = self.read_target(target, env, code)?;
                let should_assign = match op {
                    AssignOp::And => current.to_boolean(),
                    AssignOp::Or => !current.to_boolean(),
                    AssignOp::Nullish => current.is_nullish(),
                    _ => unreachable!("logical assignment ops only"),
                };
                if !should_assign {
                    return Ok(current);
                }
                let value = self.eval_expr(value, env, code)?;
                self.write_target(target, value.clone(), env, code)?;
                Ok(value)
            }
            _ => {
                let bin_op = op.binary_op().expect("compound assignment has a binary op");
                let current = self.read_target(target, env, code)?;
                let rhs = self.eval_expr(value, env, code)?;
                let result = self.binary_op(bin_op, &current, &rhs)?;
                self.write_target(target, result.clone(), env, code)?;
                Ok(result)
            }
        }
    }

    // -- functions ---------------------------------------------------------

    /// Creates a closure over `env` for function table entry `func`.
    pub(crate) fn create_function(&mut self, code: &Rc<CompiledCode>, func: FuncId, env: HeapId) -> RunResult<Value> {
        let realm = self.realm_ref().clone();
        let def = &code.ast.functions[func as usize];
        let name: Rc<str> = def.name.clone().unwrap_or_else(|| Rc::from(""));
        let length = def.params.len() as u32;
        let is_arrow = def.is_arrow;
        let data = FunctionData {
            kind: FunctionKind::Script {
                code: Rc::clone(code),
                func,
                env,
            },
            name: Rc::clone(&name),
            length,
        };
        let mut obj = JsObject::function(Some(realm.function_proto), data);
        obj.parent_scope = Some(env);
        obj.insert_property(PropertyKey::str("name"), Property::method(Value::str(&*name)));
        obj.insert_property(
            PropertyKey::str("length"),
            Property::method(Value::number(f64::from(length))),
        );
        let id = self.heap.alloc_object(obj)?;
        if !is_arrow {
            // Every plain function gets a fresh prototype object with a
            // back-pointing constructor, for `new`.
            let mut proto = JsObject::ordinary(Some(realm.object_proto));
            proto.define_method("constructor", Value::Object(id));
            let proto_id = self.heap.alloc_object(proto)?;
            self.heap
                .object_mut(id)
                .insert_property(PropertyKey::str("prototype"), Property::method(Value::Object(proto_id)));
        }
        Ok(Value::Object(id))
    }

    /// Calls any callable value with an explicit `this` and arguments.
    pub(crate) fn call_value(&mut self, func: &Value, this: Value, args: Vec<Value>) -> RunResult<Value> {
        let Value::Object(id) = func else {
            let ty = self.type_of(func);
            return Err(self.type_error(format!("{ty} is not a function")));
        };
        let id = *id;
        let kind_data = {
            let obj = self.heap.object(id);
            let ObjectData::Function(data) = &obj.data else {
                return Err(self.type_error("value is not a function"));
            };
            match &data.kind {
                FunctionKind::Script { code, func, env } => {
                    CallPlan::Script(Rc::clone(code), *func, *env, Rc::clone(&data.name))
                }
                FunctionKind::Native(native) => CallPlan::Native(*native),
                FunctionKind::Bound {
                    target,
                    this_val,
                    bound_args,
                } => CallPlan::Bound(*target, this_val.clone(), bound_args.clone()),
                FunctionKind::HostMethod { class, name, is_static } => {
                    CallPlan::HostMethod(*class, Rc::clone(name), *is_static)
                }
                FunctionKind::HostCtor { .. } => {
                    return Err(self.type_error("host constructors require new"));
                }
            }
        };
        match kind_data {
            CallPlan::Script(code, func, captured_env, name) => {
                self.call_script_function(&code, func, captured_env, Value::Object(id), this, args, &name)
            }
            CallPlan::Native(native) => crate::builtins::call_native(self, native, &this, &args, false),
            CallPlan::Bound(target, bound_this, mut bound_args) => {
                bound_args.extend(args);
                self.call_value(&Value::Object(target), bound_this, bound_args)
            }
            CallPlan::HostMethod(class, name, is_static) => {
                self.call_host_method(class, &name, is_static, &this, &args)
            }
        }
    }

    /// `new`: allocates, links the prototype, invokes with the fresh object
    /// as `this`, and keeps the constructor's object result when it returns
    /// one.
    pub(crate) fn construct_value(&mut self, func: &Value, args: Vec<Value>) -> RunResult<Value> {
        let Value::Object(id) = func else {
            let ty = self.type_of(func);
            return Err(self.type_error(format!("{ty} is not a constructor")));
        };
        let id = *id;
        let plan = {
            let obj = self.heap.object(id);
            let ObjectData::Function(data) = &obj.data else {
                return Err(self.type_error("value is not a constructor"));
            };
            match &data.kind {
                FunctionKind::Script { code, func, env } => {
                    CallPlan::Script(Rc::clone(code), *func, *env, Rc::clone(&data.name))
                }
                FunctionKind::Native(native) => CallPlan::Native(*native),
                FunctionKind::Bound { target, bound_args, .. } => {
                    CallPlan::Bound(*target, Value::Undefined, bound_args.clone())
                }
                FunctionKind::HostCtor { class } => {
                    let class = *class;
                    return self.construct_host(class, &args);
                }
                FunctionKind::HostMethod { .. } => {
                    return Err(self.type_error("host methods are not constructors"));
                }
            }
        };
        match plan {
            CallPlan::Script(code, func, captured_env, name) => {
                let realm = self.realm_ref().clone();
                let proto_value = self.get_member(&Value::Object(id), &PropertyKey::str("prototype"))?;
                let proto = proto_value.as_object().unwrap_or(realm.object_proto);
                let this_id = self.heap.alloc_object(JsObject::ordinary(Some(proto)))?;
                let result = self.call_script_function(
                    &code,
                    func,
                    captured_env,
                    Value::Object(id),
                    Value::Object(this_id),
                    args,
                    &name,
                )?;
                Ok(match result {
                    Value::Object(_) => result,
                    _ => Value::Object(this_id),
                })
            }
            CallPlan::Native(native) => crate::builtins::call_native(self, native, &Value::Undefined, &args, true),
            CallPlan::Bound(target, _, mut bound_args) => {
                bound_args.extend(args);
                self.construct_value(&Value::Object(target), bound_args)
            }
            CallPlan::HostMethod(..) => unreachable!("handled above"),
        }
    }

    #[expect(clippy::too_many_arguments, reason = "activation setup needs the full picture")]
    fn call_script_function(
        &mut self,
        code: &Rc<CompiledCode>,
        func: FuncId,
        captured_env: HeapId,
        callee: Value,
        this: Value,
        args: Vec<Value>,
        name: &Rc<str>,
    ) -> RunResult<Value> {
        self.heap
            .tracker()
            .check_call_depth(self.call_stack.len())
            .map_err(RunError::from)
            .map_err(|e| self.locate(e))?;

        let def = &code.ast.functions[func as usize];
        let is_arrow = def.is_arrow;
        let strict = def.strict;
        let def_line = def.line;

        // Direct calls bind `this` to the global object outside strict
        // mode; arrows never bind their own.
        let kind = if is_arrow {
            EnvKind::Arrow
        } else {
            let this_val = if this.is_nullish() && !strict {
                self.global.map_or(Value::Undefined, Value::Object)
            } else {
                this
            };
            EnvKind::Function { this_val }
        };
        let frame = self.new_env(kind, Some(captured_env), &def.scope)?;

        let display_name: Rc<str> = if name.is_empty() { Rc::from("<anonymous>") } else { Rc::clone(name) };
        let source: Rc<str> = Rc::from(code.ast.source_name.as_str());
        self.call_stack.push(activation(&display_name, &source, def_line));

        let result = self.run_function_body(code, func, frame, callee, args);
        self.call_stack.pop();
        result
    }

    fn run_function_body(
        &mut self,
        code: &Rc<CompiledCode>,
        func: FuncId,
        frame: HeapId,
        callee: Value,
        args: Vec<Value>,
    ) -> RunResult<Value> {
        let def = &code.ast.functions[func as usize];

        if let Some(self_slot) = def.self_slot {
            self.heap.env_mut(frame).slots[self_slot as usize] = Slot::Value(callee);
        }

        // Parameters bind in order; missing arguments destructure from
        // undefined, which is what triggers defaults.
        for (index, param) in def.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or(Value::Undefined);
            self.bind_pattern(param, value, frame, code, true)?;
        }
        if let Some(rest) = &def.rest_param {
            let remaining: Vec<Value> = args.iter().skip(def.params.len()).cloned().collect();
            let rest_value = self.new_array(remaining)?;
            self.bind_pattern(rest, rest_value, frame, code, true)?;
        }

        for (slot, hoisted) in def.hoisted_fns.clone() {
            let value = self.create_function(code, hoisted, frame)?;
            self.heap.env_mut(frame).slots[slot as usize] = Slot::Value(value);
        }

        match &def.body {
            FuncBody::Expr(expr) => self.eval_expr(expr, frame, code),
            FuncBody::Block(block) => {
                let mut completion = Value::Undefined;
                match self.exec_stmts(&block.stmts, frame, code, &mut completion)? {
                    Flow::Return(value) => Ok(value),
                    _ => Ok(Value::Undefined),
                }
            }
        }
    }

    /// Installs `@@iterator` on a freshly wrapped host iterable.
    pub(crate) fn attach_host_iterable_iterator(&mut self, wrapper: HeapId) -> RunResult<()> {
        let realm = self.realm_ref().clone();
        let data = FunctionData {
            kind: FunctionKind::Native(crate::builtins::NativeFn::Iter(crate::builtins::IterFn::HostIterableIterator)),
            name: Rc::from("[Symbol.iterator]"),
            length: 0,
        };
        let func = JsObject::function(Some(realm.function_proto), data);
        let func_id = self.heap.alloc_object(func)?;
        self.heap
            .object_mut(wrapper)
            .symbol_props
            .insert(SYM_ITERATOR, Property::method(Value::Object(func_id)));
        Ok(())
    }
}

enum CallPlan {
    Script(Rc<CompiledCode>, FuncId, HeapId, Rc<str>),
    Native(crate::builtins::NativeFn),
    Bound(HeapId, Value, Vec<Value>),
    HostMethod(crate::host::HostClassId, Rc<str>, bool),
}

enum LoopSignal {
    Break,
    Continue,
    Propagate,
}
