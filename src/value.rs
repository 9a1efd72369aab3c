//! Runtime values.
//!
//! Scalars are held inline; functions, classes and instances are shared
//! through `Rc` so that copying a value never copies the object behind it.
//! Equality on shared objects is identity.  Numbers compare by bit pattern
//! with every `NaN` alike, so `NaN` equals itself and `-0` differs from `0`.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::ast::FunctionDecl;
use crate::environment::EnvId;
use crate::error::{LoxError, Result};
use crate::token::Token;

/// Signature of host functions exposed to Lox code.
pub type NativeFn = fn(&[Value]) -> std::result::Result<Value, String>;

#[derive(Debug, Clone)]
pub enum Value {
    NativeFunction {
        name: &'static str,
        arity: usize,
        func: NativeFn,
    },
    Function(Rc<Function>),
    Class(Rc<Class>),
    Instance(Rc<RefCell<Instance>>),
    Number(f64),
    String(String),
    Bool(bool),
    Nil,
}

impl Value {
    /// `nil` and `false` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Address of the shared object behind this value; `None` for scalars.
    pub(crate) fn object_id(&self) -> Option<*const ()> {
        match self {
            Value::Function(function) => Some(Rc::as_ptr(function).cast()),
            Value::Class(class) => Some(Rc::as_ptr(class).cast()),
            Value::Instance(instance) => Some(Rc::as_ptr(instance).cast()),
            _ => None,
        }
    }

    /// Push what this value refers to directly: frames onto `frames`, shared
    /// objects onto `values`.
    pub(crate) fn references(&self, frames: &mut Vec<EnvId>, values: &mut Vec<Value>) {
        match self {
            Value::Function(function) => {
                frames.push(function.closure);
                if let Some(this) = &function.this {
                    values.push(Value::Instance(Rc::clone(this)));
                }
            }

            Value::Class(class) => {
                values.extend(class.methods.values().map(|m| Value::Function(Rc::clone(m))));
                values.extend(class.superclass.iter().map(|s| Value::Class(Rc::clone(s))));
            }

            Value::Instance(instance) => {
                let instance = instance.borrow();
                values.push(Value::Class(Rc::clone(&instance.class)));
                values.extend(instance.fields.values().cloned());
            }

            _ => {}
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Nil, Value::Nil) => true,
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Class(a), Value::Class(b)) => Rc::ptr_eq(a, b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            (Value::NativeFunction { name: a, .. }, Value::NativeFunction { name: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::NativeFunction { .. } => write!(f, "<native fn>"),

            Value::Function(function) => write!(f, "{}", function),

            Value::Class(class) => write!(f, "{}", class.name),

            Value::Instance(instance) => write!(f, "{} instance", instance.borrow().class.name),

            Value::Number(n) => {
                if n.fract() == 0.0 {
                    write!(f, "{:.0}", n)
                } else {
                    write!(f, "{}", n)
                }
            }

            Value::String(s) => write!(f, "{}", s),

            Value::Bool(b) => write!(f, "{}", b),

            Value::Nil => write!(f, "nil"),
        }
    }
}

/// A user function or method together with the scope it closed over.
pub struct Function {
    pub declaration: Rc<FunctionDecl>,
    pub closure: EnvId,
    /// Receiver of a bound method.  Each call puts it in a `this` frame
    /// between the closure and the parameters.
    pub this: Option<Rc<RefCell<Instance>>>,
    /// True for a class's `init` method; calls always yield `this`.
    pub is_initializer: bool,
}

impl Function {
    pub fn new(declaration: Rc<FunctionDecl>, closure: EnvId, is_initializer: bool) -> Self {
        Self {
            declaration,
            closure,
            this: None,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Same function with `this` fixed to `instance`.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> Function {
        Function {
            declaration: Rc::clone(&self.declaration),
            closure: self.closure,
            this: Some(instance),
            is_initializer: self.is_initializer,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

// Closures can reach themselves through the environment, so Debug stays shallow.
impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.name())
            .field("arity", &self.arity())
            .field("bound", &self.this.is_some())
            .field("is_initializer", &self.is_initializer)
            .finish()
    }
}

pub struct Class {
    pub name: String,
    pub superclass: Option<Rc<Class>>,
    pub methods: HashMap<String, Rc<Function>>,
}

impl Class {
    pub fn new(
        name: String,
        superclass: Option<Rc<Class>>,
        methods: HashMap<String, Rc<Function>>,
    ) -> Self {
        Self {
            name,
            superclass,
            methods,
        }
    }

    /// Most‑derived definition of `name`, walking up the superclass chain.
    pub fn find_method(&self, name: &str) -> Option<Rc<Function>> {
        if let Some(method) = self.methods.get(name) {
            return Some(Rc::clone(method));
        }

        self.superclass
            .as_ref()
            .and_then(|superclass| superclass.find_method(name))
    }

    /// Number of arguments a call to the class takes (that of `init`, if any).
    pub fn arity(&self) -> usize {
        self.find_method("init").map_or(0, |init| init.arity())
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field(
                "superclass",
                &self.superclass.as_ref().map(|s| s.name.as_str()),
            )
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .finish()
    }
}

pub struct Instance {
    pub class: Rc<Class>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<Class>) -> Self {
        Self {
            class,
            fields: HashMap::new(),
        }
    }

    /// Property read: fields shadow methods; methods come back bound to `this`.
    pub fn get(instance: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value> {
        if let Some(value) = instance.borrow().fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        let class = Rc::clone(&instance.borrow().class);

        match class.find_method(&name.lexeme) {
            Some(method) => Ok(Value::Function(Rc::new(method.bind(Rc::clone(instance))))),
            None => Err(LoxError::runtime(
                name,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class.name)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(Value::Bool(true).is_truthy());
        assert!(Value::Number(0.0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
    }

    #[test]
    fn number_display_drops_integral_fraction() {
        assert_eq!(Value::Number(3.0).to_string(), "3");
        assert_eq!(Value::Number(-2.0).to_string(), "-2");
        assert_eq!(Value::Number(2.5).to_string(), "2.5");
        assert_eq!(Value::Nil.to_string(), "nil");
    }

    #[test]
    fn equality_has_no_coercion() {
        assert_eq!(Value::Nil, Value::Nil);
        assert_ne!(Value::Nil, Value::Bool(false));
        assert_ne!(Value::Number(1.0), Value::String("1".into()));
        assert_eq!(Value::String("a".into()), Value::String("a".into()));
    }

    #[test]
    fn nan_equals_itself() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(f64::NAN), Value::Number(0.0));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));
        assert_eq!(Value::Number(1.5), Value::Number(1.5));
    }

    #[test]
    fn find_method_prefers_most_derived() {
        use crate::token::TokenType;

        let decl = |name: &str| {
            Rc::new(FunctionDecl {
                name: Token::new(TokenType::IDENTIFIER, name, None, 1),
                params: Vec::new(),
                body: Vec::new(),
            })
        };
        let env = crate::environment::Environments::new().alloc(None);
        let method = |name: &str| Rc::new(Function::new(decl(name), env, false));

        let mut base_methods = HashMap::new();
        base_methods.insert("speak".to_string(), method("speak"));
        base_methods.insert("walk".to_string(), method("walk"));
        let base = Rc::new(Class::new("Base".into(), None, base_methods));

        let mut derived_methods = HashMap::new();
        let own = method("speak");
        derived_methods.insert("speak".to_string(), Rc::clone(&own));
        let derived = Class::new("Derived".into(), Some(Rc::clone(&base)), derived_methods);

        let found = derived.find_method("speak").expect("speak is defined");
        assert!(Rc::ptr_eq(&found, &own));
        assert!(derived.find_method("walk").is_some());
        assert!(derived.find_method("fly").is_none());
        assert_eq!(derived.arity(), 0);
    }
}
