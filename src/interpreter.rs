//! Tree‑walking evaluator.
//!
//! Statements run against a chain of frames in an [`Environments`] arena.
//! Exactly one frame is pushed per block, per function call and per bound
//! `this`, matching the scopes the resolver pushed, so a recorded distance `d`
//! always means "walk `d` parent links from the current frame".  References
//! with no recorded distance are looked up by name in the global frame.
//!
//! `return` is not an error: statement execution yields a [`Flow`] and the
//! nearest enclosing call consumes `Flow::Return`.
//!
//! Frames captured by closures are collected between top-level statements,
//! the only point where every live value sits in a frame.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::ast::{Expr, ExprId, LiteralValue, Stmt};
use crate::environment::{EnvId, Environments};
use crate::error::{LoxError, Result};
use crate::resolver::Locals;
use crate::token::{Token, TokenType};
use crate::value::{Class, Function, Instance, Value};

/// Live frames below which no collection runs between statements.
const GC_MIN_FRAMES: usize = 1024;
const GC_HEAP_GROW_FACTOR: usize = 2;

/// How a statement finished.
#[derive(Debug)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter<W: Write = io::Stdout> {
    envs: Environments,
    globals: EnvId,
    environment: EnvId,
    locals: Locals,
    next_gc: usize,
    out: W,
}

impl Interpreter<io::Stdout> {
    /// Interpreter printing to standard output.
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    /// Creates a new Interpreter writing `print` output to `out`, with the
    /// native functions defined in the global frame.
    pub fn with_output(out: W) -> Self {
        info!("Initializing Interpreter");

        let mut envs = Environments::new();
        let globals = envs.alloc(None);
        envs.capture(globals);

        debug!("Defining native function 'clock'");

        envs.define(
            globals,
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock,
            },
        );

        Self {
            envs,
            environment: globals,
            globals,
            locals: HashMap::new(),
            next_gc: GC_MIN_FRAMES,
            out,
        }
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Interprets a resolved program.  `locals` is merged into the distances
    /// already known, so closures from earlier runs keep working.
    pub fn interpret(&mut self, statements: &[Stmt], locals: Locals) -> Result<()> {
        debug!(
            "Interpreting {} statements with {} resolved reference(s)",
            statements.len(),
            locals.len()
        );

        self.locals.extend(locals);

        let result = self.execute_top_level(statements);
        self.collect_garbage();
        self.out.flush()?;
        result?;

        info!("Interpretation completed successfully");
        Ok(())
    }

    fn execute_top_level(&mut self, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                debug!("Top-level return of {} ignored", value);
            }

            if self.envs.live() > self.next_gc {
                self.collect_garbage();
            }
        }

        Ok(())
    }

    /// Frees frames unreachable from the globals.  Runs only between
    /// top-level statements.
    fn collect_garbage(&mut self) {
        let freed = self.envs.collect(&[self.globals, self.environment]);
        self.next_gc = (self.envs.live() * GC_HEAP_GROW_FACTOR).max(GC_MIN_FRAMES);
        debug!("Freed {} frame(s); next collection above {}", freed, self.next_gc);
    }

    /// Frames currently allocated, the globals included.
    pub fn live_frames(&self) -> usize {
        self.envs.live()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────────────

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Flow> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{}", value)?;
                debug!("Printed value: {}", value);
            }

            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Variable '{}' defined with value: {}", name.lexeme, value);
                self.envs.define(self.environment, &name.lexeme, value);
            }

            Stmt::Block(statements) => {
                let env = self.envs.alloc(Some(self.environment));
                return self.execute_block(statements, env);
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    return self.execute(then_branch);
                } else if let Some(else_stmt) = else_branch {
                    return self.execute(else_stmt);
                }
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }

            Stmt::Function(decl) => {
                debug!("Defining function '{}'", decl.name.lexeme);
                self.envs.capture(self.environment);
                let function = Function::new(Rc::clone(decl), self.environment, false);
                self.envs.define(
                    self.environment,
                    &decl.name.lexeme,
                    Value::Function(Rc::new(function)),
                );
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                return Ok(Flow::Return(value));
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => {
                let superclass = match superclass {
                    Some(expr) => match self.evaluate(expr)? {
                        Value::Class(class) => Some(class),
                        _ => {
                            let at = match expr {
                                Expr::Variable { name, .. } => name,
                                _ => name,
                            };
                            return Err(LoxError::runtime(at, "Superclass must be a class."));
                        }
                    },
                    None => None,
                };

                self.envs.define(self.environment, &name.lexeme, Value::Nil);

                // Methods of a subclass close over an extra frame holding `super`.
                let method_env = match &superclass {
                    Some(superclass) => {
                        let env = self.envs.alloc(Some(self.environment));
                        self.envs.define(env, "super", Value::Class(Rc::clone(superclass)));
                        env
                    }
                    None => self.environment,
                };
                self.envs.capture(method_env);

                let methods: HashMap<String, Rc<Function>> = methods
                    .iter()
                    .map(|decl| {
                        let is_init = decl.name.lexeme == "init";
                        let function = Function::new(Rc::clone(decl), method_env, is_init);
                        (decl.name.lexeme.clone(), Rc::new(function))
                    })
                    .collect();

                let class = Class::new(name.lexeme.clone(), superclass, methods);
                info!("Class '{}' defined", name.lexeme);

                self.envs
                    .define(self.environment, &name.lexeme, Value::Class(Rc::new(class)));
            }
        }

        Ok(Flow::Normal)
    }

    /// Run `statements` inside `env`; the previous frame is restored on every
    /// exit path, including errors.  `env` is released afterwards.
    pub fn execute_block(&mut self, statements: &[Stmt], env: EnvId) -> Result<Flow> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = self.execute_all(statements);
        self.environment = previous;
        self.envs.release(env);
        result
    }

    fn execute_all(&mut self, statements: &[Stmt]) -> Result<Flow> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.token_type {
                    TokenType::MINUS => Ok(Value::Number(-number_operand(operator, &right)?)),
                    TokenType::BANG => Ok(Value::Bool(!right.is_truthy())),
                    _ => Err(LoxError::runtime(operator, "Invalid unary operator.")),
                }
            }

            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let short_circuits = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        self.envs
                            .assign_at(self.environment, distance, name, value.clone())?
                    }
                    None => self.envs.assign(self.globals, name, value.clone())?,
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate(callee)?;

                let mut args = Vec::with_capacity(arguments.len());
                for arg in arguments {
                    args.push(self.evaluate(arg)?);
                }

                self.invoke_callable(callee, paren, args)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(LoxError::runtime(name, "Only instances have properties.")),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => self.envs.get_at(self.environment, distance, name),
            None => self.envs.get(self.globals, name),
        }
    }

    /// `super.method`: the superclass lives `distance` frames out, and the
    /// `this` frame sits directly inside it.
    fn evaluate_super(&self, id: ExprId, keyword: &Token, method: &Token) -> Result<Value> {
        let distance = *self
            .locals
            .get(&id)
            .ok_or_else(|| LoxError::runtime(keyword, "Can't use 'super' outside of a class."))?;

        let superclass = match self.envs.get_at(self.environment, distance, keyword)? {
            Value::Class(class) => class,
            _ => return Err(LoxError::runtime(keyword, "Superclass must be a class.")),
        };

        let this = Token::synthetic("this", keyword.line);
        let instance = match self
            .envs
            .get_at(self.environment, distance.saturating_sub(1), &this)?
        {
            Value::Instance(instance) => instance,
            _ => return Err(LoxError::runtime(keyword, "Can't use 'super' outside of a class.")),
        };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),
            None => Err(LoxError::runtime(
                method,
                format!("Undefined property '{}'.", method.lexeme),
            )),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Calls
    // ─────────────────────────────────────────────────────────────────────────

    /// Invokes a callable (native function, user function or class).
    fn invoke_callable(&mut self, callee: Value, paren: &Token, args: Vec<Value>) -> Result<Value> {
        match callee {
            Value::NativeFunction { name, arity, func } => {
                debug!("Calling native function '{}'", name);
                check_arity(paren, arity, args.len())?;
                func(&args).map_err(|msg| LoxError::runtime(paren, msg))
            }

            Value::Function(function) => {
                check_arity(paren, function.arity(), args.len())?;
                self.call_function(&function, args)
            }

            Value::Class(class) => {
                check_arity(paren, class.arity(), args.len())?;

                let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(&class))));

                if let Some(init) = class.find_method("init") {
                    self.call_function(&init.bind(Rc::clone(&instance)), args)?;
                }

                Ok(Value::Instance(instance))
            }

            _ => Err(LoxError::runtime(paren, "Can only call functions and classes.")),
        }
    }

    /// One new frame on top of the closure holds the parameters; the body runs
    /// in it as a block.  A bound method gets a `this` frame in between.
    /// Initializers always produce the bound `this`.
    pub fn call_function(&mut self, function: &Function, args: Vec<Value>) -> Result<Value> {
        debug!("Calling user-defined function '{}'", function.name());

        let this_env = function.this.as_ref().map(|instance| {
            let env = self.envs.alloc(Some(function.closure));
            self.envs.define(env, "this", Value::Instance(Rc::clone(instance)));
            env
        });

        let env = self.envs.alloc(Some(this_env.unwrap_or(function.closure)));
        for (param, arg) in function.declaration.params.iter().zip(args) {
            self.envs.define(env, &param.lexeme, arg);
        }

        let flow = self.execute_block(&function.declaration.body, env);
        if let Some(this_env) = this_env {
            self.envs.release(this_env);
        }
        let flow = flow?;

        if function.is_initializer {
            return match &function.this {
                Some(instance) => Ok(Value::Instance(Rc::clone(instance))),
                None => Err(LoxError::runtime(
                    &function.declaration.name,
                    "Initializer is not bound to an instance.",
                )),
            };
        }

        match flow {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value> {
    match operator.token_type {
        TokenType::PLUS => match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
            _ => Err(LoxError::runtime(
                operator,
                "Operands must be two numbers or two strings.",
            )),
        },

        TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
        TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

        _ => {
            let (a, b) = number_operands(operator, &left, &right)?;
            match operator.token_type {
                TokenType::MINUS => Ok(Value::Number(a - b)),
                TokenType::STAR => Ok(Value::Number(a * b)),
                TokenType::SLASH => Ok(Value::Number(a / b)),
                TokenType::GREATER => Ok(Value::Bool(a > b)),
                TokenType::GREATER_EQUAL => Ok(Value::Bool(a >= b)),
                TokenType::LESS => Ok(Value::Bool(a < b)),
                TokenType::LESS_EQUAL => Ok(Value::Bool(a <= b)),
                _ => Err(LoxError::runtime(operator, "Invalid binary operator.")),
            }
        }
    }
}

fn number_operand(operator: &Token, operand: &Value) -> Result<f64> {
    match operand {
        Value::Number(n) => Ok(*n),
        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
    }
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64)> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(LoxError::runtime(operator, "Operands must be numbers.")),
    }
}

fn check_arity(paren: &Token, expected: usize, got: usize) -> Result<()> {
    if expected == got {
        return Ok(());
    }

    Err(LoxError::runtime(
        paren,
        format!("Expected {} arguments but got {}.", expected, got),
    ))
}

// ─────────────────────────────────────────────────────────────────────────────
// Natives
// ─────────────────────────────────────────────────────────────────────────────

/// Seconds since the Unix epoch, advanced by a monotonic clock so successive
/// readings never go backwards.
fn clock(_args: &[Value]) -> std::result::Result<Value, String> {
    static ANCHOR: OnceLock<(Instant, f64)> = OnceLock::new();

    let (start, epoch) = ANCHOR.get_or_init(|| {
        let epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        (Instant::now(), epoch)
    });

    Ok(Value::Number(epoch + start.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;
    use crate::resolver::resolve;
    use crate::scanner::scan_all;

    fn run(interpreter: &mut Interpreter<Vec<u8>>, source: &str) {
        let (tokens, errors) = scan_all(source.as_bytes());
        assert!(errors.is_empty(), "{:?}", errors);
        let (program, errors) = parse(tokens);
        assert!(errors.is_empty(), "{:?}", errors);
        let (locals, errors) = resolve(&program);
        assert!(errors.is_empty(), "{:?}", errors);

        interpreter.interpret(&program, locals).expect("program runs");
    }

    fn printed(interpreter: &Interpreter<Vec<u8>>) -> String {
        String::from_utf8_lossy(&interpreter.out).into_owned()
    }

    #[test]
    fn returned_closure_keeps_its_frame_until_dropped() {
        let mut interpreter = Interpreter::with_output(Vec::new());

        run(
            &mut interpreter,
            "fun outer() { fun inner() { return 1; } return inner; } var h = outer();",
        );
        assert_eq!(interpreter.live_frames(), 2);

        run(&mut interpreter, "h = nil;");
        assert_eq!(interpreter.live_frames(), 1);
    }

    #[test]
    fn local_classes_do_not_pin_call_frames() {
        let mut interpreter = Interpreter::with_output(Vec::new());

        run(
            &mut interpreter,
            "fun make() { class A { m() { return this; } } return A().m(); }
             var i = 0;
             while (i < 3) { make(); i = i + 1; }",
        );

        assert_eq!(interpreter.live_frames(), 1);
    }

    #[test]
    fn closures_survive_collection() {
        let mut interpreter = Interpreter::with_output(Vec::new());

        run(
            &mut interpreter,
            "fun counter() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }
             var c = counter();",
        );
        run(&mut interpreter, "print c(); print c();");

        assert_eq!(printed(&interpreter), "1\n2\n");
    }

    #[test]
    fn bound_method_keeps_its_receiver() {
        let mut interpreter = Interpreter::with_output(Vec::new());

        run(
            &mut interpreter,
            "class Box { init(x) { this.x = x; } get() { return this.x; } }
             var get = Box(3).get;",
        );
        run(&mut interpreter, "print get();");

        assert_eq!(printed(&interpreter), "3\n");
        assert_eq!(interpreter.live_frames(), 1);
    }

    // Earlier units' closures may still run, so their distances are kept.
    #[test]
    fn resolved_distances_accumulate_across_units() {
        let mut interpreter = Interpreter::with_output(Vec::new());

        run(&mut interpreter, "{ var a = 1; print a; }");
        assert_eq!(interpreter.locals.len(), 1);

        run(&mut interpreter, "{ var a = 2; print a; }");
        assert_eq!(interpreter.locals.len(), 2);
        assert_eq!(printed(&interpreter), "1\n2\n");
    }
}
