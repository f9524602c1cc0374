/*
 * mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Artifact runtime.
//!
//! [`Interpreter`] executes a parsed [`Program`] against a render context:
//!
//! - One flat variable scope per render; included templates share it.
//! - All output is buffered; nothing is returned unless the whole render
//!   succeeds.
//! - Undefined variables and missing keys read as null, or fail the render
//!   in strict mode. `isset`, `empty` and `??` never fail on them.
//! - `include` goes back through an [`IncludeLoader`] so each included
//!   template is located and compiled on its own.

pub mod builtins;
pub mod ops;

use crate::artifact::ast::{BinaryOp, Expr, ForeachStmt, IfStmt, Program, Stmt};
use crate::config::DEFAULT_MAX_INCLUDE_DEPTH;
use crate::context::RenderContext;
use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;
use builtins::{FunctionError, FunctionRegistry};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Loads templates named by `include` statements.
pub trait IncludeLoader {
    /// Locate, compile and parse the template `name`.
    ///
    /// Returns the template's source path (used to label errors) and its
    /// program.
    fn load_include(&self, name: &str) -> TemplateResult<(PathBuf, Program)>;
}

/// Loader for programs that must not include anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLoader;

impl IncludeLoader for NullLoader {
    fn load_include(&self, name: &str) -> TemplateResult<(PathBuf, Program)> {
        Err(TemplateError::TemplateNotFound {
            name: name.to_string(),
            attempted: Vec::new(),
        })
    }
}

/// How a statement finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Normal,
    Break,
    Continue,
}

/// Executes one render.
pub struct Interpreter<'a> {
    functions: &'a FunctionRegistry,
    loader: &'a dyn IncludeLoader,
    scope: IndexMap<String, Value>,
    output: String,
    path: PathBuf,
    include_depth: usize,
    max_include_depth: usize,
    loop_depth: usize,
    strict_variables: bool,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        functions: &'a FunctionRegistry,
        loader: &'a dyn IncludeLoader,
        context: RenderContext,
    ) -> Self {
        Self {
            functions,
            loader,
            scope: context.into_variables(),
            output: String::new(),
            path: PathBuf::new(),
            include_depth: 0,
            max_include_depth: DEFAULT_MAX_INCLUDE_DEPTH,
            loop_depth: 0,
            strict_variables: false,
        }
    }

    /// Fail on undefined variables and missing keys instead of reading null.
    pub fn with_strict_variables(mut self, strict: bool) -> Self {
        self.strict_variables = strict;
        self
    }

    pub fn with_max_include_depth(mut self, depth: usize) -> Self {
        self.max_include_depth = depth;
        self
    }

    /// Run `program`, compiled from the template at `path`, and return its
    /// output.
    pub fn execute(mut self, program: &Program, path: &Path) -> TemplateResult<String> {
        self.path = path.to_path_buf();
        self.block(&program.body)?;
        Ok(self.output)
    }

    fn fail(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::render_failure(&self.path, message)
    }

    fn block(&mut self, body: &[Stmt]) -> TemplateResult<Flow> {
        for stmt in body {
            let flow = self.statement(stmt)?;
            if flow != Flow::Normal {
                return Ok(flow);
            }
        }
        Ok(Flow::Normal)
    }

    fn statement(&mut self, stmt: &Stmt) -> TemplateResult<Flow> {
        match stmt {
            Stmt::Text(text) => self.output.push_str(text),
            Stmt::Echo(exprs) => {
                for expr in exprs {
                    let value = self.eval(expr)?;
                    self.output.push_str(&value.to_output_string());
                }
            }
            Stmt::Expr(expr) => {
                self.eval(expr)?;
            }
            Stmt::Unset(targets) => {
                for target in targets {
                    self.unset(target)?;
                }
            }
            Stmt::If(stmt) => return self.if_statement(stmt),
            Stmt::While(stmt) => {
                self.loop_depth += 1;
                let result = self.while_loop(&stmt.condition, &stmt.body);
                self.loop_depth -= 1;
                result?;
            }
            Stmt::Foreach(stmt) => {
                self.loop_depth += 1;
                let result = self.foreach_loop(stmt);
                self.loop_depth -= 1;
                result?;
            }
            Stmt::Break { line } => return self.loop_control(Flow::Break, "break", *line),
            Stmt::Continue { line } => return self.loop_control(Flow::Continue, "continue", *line),
            Stmt::Include { target, line } => self.include(target, *line)?,
        }
        Ok(Flow::Normal)
    }

    fn loop_control(&self, flow: Flow, keyword: &str, line: usize) -> TemplateResult<Flow> {
        if self.loop_depth == 0 {
            return Err(self.fail(format!("'{keyword}' not in loop context (line {line})")));
        }
        Ok(flow)
    }

    fn if_statement(&mut self, stmt: &IfStmt) -> TemplateResult<Flow> {
        for (condition, body) in &stmt.branches {
            if self.eval(condition)?.is_truthy() {
                return self.block(body);
            }
        }
        match &stmt.else_branch {
            Some(body) => self.block(body),
            None => Ok(Flow::Normal),
        }
    }

    fn while_loop(&mut self, condition: &Expr, body: &[Stmt]) -> TemplateResult<()> {
        while self.eval(condition)?.is_truthy() {
            if self.block(body)? == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    fn foreach_loop(&mut self, stmt: &ForeachStmt) -> TemplateResult<()> {
        let entries: Vec<(Value, Value)> = match self.eval(&stmt.subject)? {
            Value::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (Value::Int(i64::try_from(i).unwrap_or(i64::MAX)), v))
                .collect(),
            Value::Map(map) => map
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
            other => {
                tracing::warn!(
                    path = %self.path.display(),
                    line = stmt.line,
                    "foreach over {} skipped",
                    other.type_name()
                );
                return Ok(());
            }
        };

        for (key, value) in entries {
            if let Some(key_var) = &stmt.key_var {
                self.scope.insert(key_var.clone(), key);
            }
            self.scope.insert(stmt.value_var.clone(), value);
            if self.block(&stmt.body)? == Flow::Break {
                break;
            }
        }
        Ok(())
    }

    fn include(&mut self, target: &Expr, line: usize) -> TemplateResult<()> {
        let name = self.eval(target)?.to_output_string();
        if self.include_depth >= self.max_include_depth {
            return Err(TemplateError::RecursiveInclude {
                name,
                max_depth: self.max_include_depth,
            });
        }

        let (path, program) = self.loader.load_include(&name)?;
        tracing::debug!(name = %name, line, path = %path.display(), "include");

        let outer_path = std::mem::replace(&mut self.path, path);
        let outer_loops = std::mem::replace(&mut self.loop_depth, 0);
        self.include_depth += 1;
        let result = self.block(&program.body);
        self.include_depth -= 1;
        self.loop_depth = outer_loops;
        self.path = outer_path;
        result.map(|_| ())
    }

    fn eval(&mut self, expr: &Expr) -> TemplateResult<Value> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => match self.scope.get(name) {
                Some(value) => Ok(value.clone()),
                None => self.undefined(format!("Undefined variable ${name}")),
            },
            Expr::Interpolated(parts) => {
                let mut s = String::new();
                for part in parts {
                    s.push_str(&self.eval(part)?.to_output_string());
                }
                Ok(Value::String(s))
            }
            Expr::Array(entries) => {
                let mut array = Value::List(Vec::new());
                for (key, value) in entries {
                    let key = match key {
                        Some(k) => Some(self.eval(k)?),
                        None => None,
                    };
                    let value = self.eval(value)?;
                    *slot(&mut array, key).map_err(|m| self.fail(m))? = value;
                }
                Ok(array)
            }
            Expr::Index { base, index } => {
                let Some(index) = index else {
                    return Err(self.fail("Cannot use [] for reading"));
                };
                let base = self.eval(base)?;
                let key = self.eval(index)?;
                self.index(&base, &key)
            }
            Expr::Property { base, name } => {
                let base = self.eval(base)?;
                self.index(&base, &Value::String(name.clone()))
            }
            Expr::Call { name, args } => self.call(name, args),
            Expr::Constant(name) => Err(self.fail(format!("Undefined constant \"{name}\""))),
            Expr::Unary { op, operand } => {
                let operand = self.eval(operand)?;
                ops::unary(*op, &operand).map_err(|m| self.fail(m))
            }
            Expr::Binary {
                op: op @ (BinaryOp::And | BinaryOp::Or),
                left,
                right,
            } => {
                let left = self.eval(left)?.is_truthy();
                let result = match op {
                    BinaryOp::And => left && self.eval(right)?.is_truthy(),
                    _ => left || self.eval(right)?.is_truthy(),
                };
                Ok(Value::Bool(result))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                ops::binary(*op, &left, &right).map_err(|m| self.fail(m))
            }
            Expr::Ternary {
                condition,
                then,
                otherwise,
            } => {
                let condition = self.eval(condition)?;
                match (condition.is_truthy(), then) {
                    (true, Some(then)) => self.eval(then),
                    (true, None) => Ok(condition),
                    (false, _) => self.eval(otherwise),
                }
            }
            Expr::Coalesce { left, right } => match self.quiet(left)? {
                Some(value) if !value.is_null() => Ok(value),
                _ => self.eval(right),
            },
            Expr::Assign { target, value } => {
                let value = self.eval(value)?;
                self.assign(target, value.clone())?;
                Ok(value)
            }
        }
    }

    fn undefined(&self, message: String) -> TemplateResult<Value> {
        if self.strict_variables {
            return Err(self.fail(message));
        }
        tracing::debug!(path = %self.path.display(), "{message}");
        Ok(Value::Null)
    }

    fn index(&self, base: &Value, key: &Value) -> TemplateResult<Value> {
        match base {
            Value::List(_) | Value::Map(_) => match base.get(key) {
                Some(value) => Ok(value.clone()),
                None => self.undefined(format!("Undefined array key \"{}\"", key.to_key())),
            },
            Value::String(s) => {
                let offset = key
                    .as_number()
                    .map(|n| n.as_f64() as i64)
                    .and_then(|i| usize::try_from(i).ok());
                match offset.and_then(|i| s.chars().nth(i)) {
                    Some(c) => Ok(Value::String(c.to_string())),
                    None => self.undefined(format!("Uninitialized string offset {}", key.to_key())),
                }
            }
            Value::Null => self.undefined(format!(
                "Trying to access array offset \"{}\" on null",
                key.to_key()
            )),
            _ => Ok(Value::Null),
        }
    }

    /// Evaluate without undefined-variable failures. `None` means unset.
    fn quiet(&mut self, expr: &Expr) -> TemplateResult<Option<Value>> {
        match expr {
            Expr::Var(name) => Ok(self.scope.get(name).cloned()),
            Expr::Index {
                base,
                index: Some(index),
            } => {
                let Some(base) = self.quiet(base)? else {
                    return Ok(None);
                };
                let key = self.eval(index)?;
                Ok(match &base {
                    Value::String(s) => key
                        .as_number()
                        .and_then(|n| usize::try_from(n.as_f64() as i64).ok())
                        .and_then(|i| s.chars().nth(i))
                        .map(|c| Value::String(c.to_string())),
                    other => other.get(&key).cloned(),
                })
            }
            Expr::Property { base, name } => {
                let Some(base) = self.quiet(base)? else {
                    return Ok(None);
                };
                Ok(base.get(&Value::String(name.clone())).cloned())
            }
            other => self.eval(other).map(Some),
        }
    }

    fn call(&mut self, name: &str, args: &[Expr]) -> TemplateResult<Value> {
        match name {
            "isset" => {
                for arg in args {
                    match self.quiet(arg)? {
                        Some(value) if !value.is_null() => {}
                        _ => return Ok(Value::Bool(false)),
                    }
                }
                return Ok(Value::Bool(!args.is_empty()));
            }
            "empty" => {
                let [arg] = args else {
                    return Err(self.fail("empty() expects exactly 1 argument"));
                };
                let value = self.quiet(arg)?;
                return Ok(Value::Bool(!value.is_some_and(|v| v.is_truthy())));
            }
            _ => {}
        }

        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg)?);
        }
        let Some(function) = self.functions.get(name) else {
            return Err(self.fail(format!("Call to undefined function {name}()")));
        };
        function(&values).map_err(|e| match e {
            FunctionError::Exit(output) => TemplateError::EarlyExit { output },
            FunctionError::Failed(message) => self.fail(format!("{name}(): {message}")),
        })
    }

    /// Split an lvalue into its root variable and the keys below it.
    /// `None` keys are appends (`$a[]`).
    fn lvalue(&mut self, expr: &Expr) -> TemplateResult<(String, Vec<Option<Value>>)> {
        match expr {
            Expr::Var(name) => Ok((name.clone(), Vec::new())),
            Expr::Index { base, index } => {
                let (root, mut keys) = self.lvalue(base)?;
                let key = match index {
                    Some(index) => Some(self.eval(index)?),
                    None => None,
                };
                keys.push(key);
                Ok((root, keys))
            }
            Expr::Property { base, name } => {
                let (root, mut keys) = self.lvalue(base)?;
                keys.push(Some(Value::String(name.clone())));
                Ok((root, keys))
            }
            _ => Err(self.fail("Cannot assign to this expression")),
        }
    }

    fn assign(&mut self, target: &Expr, value: Value) -> TemplateResult<()> {
        let (root, keys) = self.lvalue(target)?;
        let mut current = self.scope.entry(root).or_insert(Value::Null);
        for key in keys {
            current = match slot(current, key) {
                Ok(next) => next,
                Err(message) => return Err(TemplateError::render_failure(&self.path, message)),
            };
        }
        *current = value;
        Ok(())
    }

    fn unset(&mut self, target: &Expr) -> TemplateResult<()> {
        let (root, mut keys) = self.lvalue(target)?;
        let Some(last) = keys.pop() else {
            self.scope.shift_remove(&root);
            return Ok(());
        };
        let Some(mut current) = self.scope.get_mut(&root) else {
            return Ok(());
        };
        for key in keys {
            let Some(key) = key else {
                return Ok(());
            };
            let Some(next) = existing_slot(current, &key) else {
                return Ok(());
            };
            current = next;
        }
        if let Some(key) = last {
            remove_key(current, &key);
        }
        Ok(())
    }
}

/// Index of `key` if it reads as a non-negative integer key.
fn int_key(key: &Value) -> Option<usize> {
    match key {
        Value::Int(i) => usize::try_from(*i).ok(),
        Value::Bool(b) => Some(usize::from(*b)),
        Value::String(s) => s
            .parse::<usize>()
            .ok()
            .filter(|i| i.to_string() == *s),
        _ => None,
    }
}

fn list_to_map(items: Vec<Value>) -> Value {
    Value::Map(
        items
            .into_iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
    )
}

fn next_map_key(map: &IndexMap<String, Value>) -> String {
    map.keys()
        .filter_map(|k| k.parse::<i64>().ok())
        .max()
        .map_or(0, |max| max.saturating_add(1))
        .to_string()
}

/// Mutable slot for `key` in `container`, creating it (and turning null into
/// an array) as needed.
fn slot(container: &mut Value, key: Option<Value>) -> Result<&mut Value, String> {
    if container.is_null() {
        *container = match &key {
            None => Value::List(Vec::new()),
            Some(k) if int_key(k) == Some(0) => Value::List(Vec::new()),
            Some(_) => Value::Map(IndexMap::new()),
        };
    }

    let list_index = match &*container {
        Value::List(items) => Some(match &key {
            None => Some(items.len()),
            Some(k) => int_key(k).filter(|&i| i <= items.len()),
        }),
        _ => None,
    };
    match list_index {
        Some(Some(i)) => {
            if let Value::List(items) = container {
                if i == items.len() {
                    items.push(Value::Null);
                }
                return Ok(&mut items[i]);
            }
        }
        // Non-sequential key: the list becomes a map with its indices as keys.
        Some(None) => {
            if let Value::List(items) = container {
                let items = std::mem::take(items);
                *container = list_to_map(items);
            }
        }
        None => {}
    }

    match container {
        Value::Map(map) => {
            let key = match key {
                Some(k) => k.to_key(),
                None => next_map_key(map),
            };
            Ok(map.entry(key).or_insert(Value::Null))
        }
        other => Err(format!(
            "Cannot use a scalar value ({}) as an array",
            other.type_name()
        )),
    }
}

fn existing_slot<'v>(container: &'v mut Value, key: &Value) -> Option<&'v mut Value> {
    match container {
        Value::List(items) => int_key(key).and_then(|i| items.get_mut(i)),
        Value::Map(map) => map.get_mut(&key.to_key()),
        _ => None,
    }
}

fn remove_key(container: &mut Value, key: &Value) {
    if let Value::List(items) = container {
        if int_key(key).is_some_and(|i| i < items.len()) {
            // Remaining elements keep their keys.
            let items = std::mem::take(items);
            *container = list_to_map(items);
        } else {
            return;
        }
    }
    if let Value::Map(map) = container {
        map.shift_remove(&key.to_key());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::parser::parse_program;
    use pretty_assertions::assert_eq;

    fn run_with(source: &str, context: RenderContext, strict: bool) -> TemplateResult<String> {
        let program = parse_program(source).unwrap();
        let functions = FunctionRegistry::with_builtins();
        Interpreter::new(&functions, &NullLoader, context)
            .with_strict_variables(strict)
            .execute(&program, Path::new("test.tpl"))
    }

    fn run(source: &str, context: RenderContext) -> String {
        run_with(source, context, false).unwrap()
    }

    #[test]
    fn test_echo_and_text() {
        let ctx = RenderContext::new().with("name", "<b>");
        assert_eq!(
            run("Hi <?tpl echo escape(strval($name)); ?>!", ctx),
            "Hi &lt;b&gt;!"
        );
    }

    #[test]
    fn test_if_chain() {
        let source = "<?tpl if ($n > 1) : ?>many<?tpl elseif ($n == 1) : ?>one<?tpl else : ?>none<?tpl endif; ?>";
        assert_eq!(run(source, RenderContext::new().with("n", 2i64)), "many");
        assert_eq!(run(source, RenderContext::new().with("n", 1i64)), "one");
        assert_eq!(run(source, RenderContext::new().with("n", 0i64)), "none");
    }

    #[test]
    fn test_foreach_keyed_and_break() {
        let ctx = RenderContext::from_json(serde_json::json!({"m": {"a": 1, "b": 2, "c": 3}}))
            .unwrap();
        let source = "<?tpl foreach ($m as $k => $v) : ?><?tpl if ($v == 3) : break; endif; ?><?tpl echo $k, '=', $v, ';'; ?><?tpl endforeach; ?>";
        assert_eq!(run(source, ctx), "a=1;b=2;");
    }

    #[test]
    fn test_while_and_continue() {
        let source = "<?tpl $i = 0; while ($i < 5) : $i = $i + 1; if ($i % 2 == 0) : continue; endif; echo $i; endwhile; ?>";
        assert_eq!(run(source, RenderContext::new()), "135");
    }

    #[test]
    fn test_assignment_autovivifies() {
        let source = "<?tpl $a['x']['y'] = 1; $b[] = 'p'; $b[] = 'q'; echo json_encode($a), implode(',', $b); ?>";
        assert_eq!(run(source, RenderContext::new()), r#"{"x":{"y":1}}p,q"#);
    }

    #[test]
    fn test_unset() {
        let source = "<?tpl $a = ['k' => 1, 'j' => 2]; unset($a['k']); echo json_encode($a); unset($a); echo isset($a) ? 'set' : 'gone'; ?>";
        assert_eq!(run(source, RenderContext::new()), r#"{"j":2}gone"#);
    }

    #[test]
    fn test_isset_empty_and_coalesce_are_quiet() {
        let source = "<?tpl echo isset($missing) ? 'y' : 'n', empty($missing['k']) ? 'e' : 'f', $missing ?? 'dflt'; ?>";
        assert_eq!(run_with(source, RenderContext::new(), true).unwrap(), "nedflt");
    }

    #[test]
    fn test_undefined_variable_modes() {
        let source = "[<?tpl echo $nope; ?>]";
        assert_eq!(run(source, RenderContext::new()), "[]");

        let err = run_with(source, RenderContext::new(), true).unwrap_err();
        match err {
            TemplateError::RenderFailure { path, message } => {
                assert_eq!(path, PathBuf::from("test.tpl"));
                assert!(message.contains("$nope"), "{message}");
            }
            other => panic!("expected RenderFailure, got {other:?}"),
        }
    }

    #[test]
    fn test_break_outside_loop() {
        let err = run_with("<?tpl break; ?>", RenderContext::new(), false).unwrap_err();
        assert!(matches!(err, TemplateError::RenderFailure { .. }));
    }

    #[test]
    fn test_interpolation_and_property() {
        let ctx = RenderContext::from_json(serde_json::json!({"user": {"name": "Ann"}})).unwrap();
        assert_eq!(
            run("<?tpl $n = $user->name; echo \"hi $n\"; ?>", ctx),
            "hi Ann"
        );
    }

    #[test]
    fn test_host_function_exit_is_not_wrapped() {
        let mut functions = FunctionRegistry::with_builtins();
        functions.register("halt", |_| Err(FunctionError::Exit("cached page".to_string())));
        let program = parse_program("before<?tpl echo halt(); ?>after").unwrap();

        let err = Interpreter::new(&functions, &NullLoader, RenderContext::new())
            .execute(&program, Path::new("t.tpl"))
            .unwrap_err();
        match err {
            TemplateError::EarlyExit { output } => assert_eq!(output, "cached page"),
            other => panic!("expected EarlyExit, got {other:?}"),
        }
    }

    #[test]
    fn test_undefined_function_and_constant() {
        assert!(run_with("<?tpl echo nope(); ?>", RenderContext::new(), false).is_err());
        assert!(run_with("<?tpl echo FOO; ?>", RenderContext::new(), false).is_err());
    }
}
