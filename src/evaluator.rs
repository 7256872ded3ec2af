//! The evaluation engine: environments, sessions, and the recursive
//! `eval` transform.
//!
//! Environments form a parent-linked chain of ordered symbol bindings.
//! A chain node is shared by reference (`Rc<RefCell<_>>`) because several
//! live closures may keep one scope alive, but values themselves are never
//! shared: a lookup always hands back a deep copy, so callers may freely
//! mutate or discard what they receive.
//!
//! Evaluation is a plain synchronous recursion with an explicit depth budget.
//! Symbols resolve through the environment chain, S-expressions reduce to a
//! function application, and everything else evaluates to itself. All
//! failures are `Error` values; the first erroring element of an
//! S-expression short-circuits the whole expression.
//!
//! Closure application lives here too: positional and variadic binding,
//! partial application, and the call-time reattachment of a closure's
//! environment to the invoking scope.

use std::cell::RefCell;
use std::rc::Rc;

use crate::MAX_EVAL_DEPTH;
use crate::ast::{Closure, Formal, Function, Value};
use crate::builtinops::builtin_ops;

/// Shared handle to an environment in the scope chain
pub type EnvRef = Rc<RefCell<Env>>;

/// Ordered symbol bindings with a link to the enclosing scope.
///
/// Bindings are unique by name within one scope; redefinition replaces in
/// place. Cloning an environment duplicates its bindings but carries the
/// parent link over by reference.
#[derive(Clone, Default)]
pub struct Env {
    parent: Option<EnvRef>,
    bindings: Vec<(String, Value)>,
}

impl Env {
    /// Create a fresh scope with no parent and no bindings
    pub(crate) fn empty() -> EnvRef {
        Rc::new(RefCell::new(Env::default()))
    }

    /// Look a symbol up in this scope, then up the parent chain.
    /// Returns a copy of the bound value, never the stored value itself.
    pub fn get(&self, name: &str) -> Option<Value> {
        for (symbol, value) in &self.bindings {
            if symbol == name {
                return Some(value.clone());
            }
        }
        match &self.parent {
            Some(parent) => parent.borrow().get(name),
            None => None,
        }
    }

    /// Define or replace a binding in this scope
    pub fn put(&mut self, name: &str, value: Value) {
        let existing = self
            .bindings
            .iter()
            .position(|(symbol, _)| symbol == name);
        match existing {
            Some(index) => self.bindings[index].1 = value,
            None => self.bindings.push((name.to_owned(), value)),
        }
    }

    pub(crate) fn set_parent(&mut self, parent: EnvRef) {
        self.parent = Some(parent);
    }

    /// All bindings visible from this scope, parent bindings shadowed by
    /// local ones, sorted by name.
    pub fn visible_bindings(&self) -> Vec<(String, Value)> {
        let mut bindings = Vec::new();
        if let Some(parent) = &self.parent {
            bindings = parent.borrow().visible_bindings();
        }
        for (name, value) in &self.bindings {
            match bindings.iter().position(|(existing, _)| existing == name) {
                Some(index) => bindings[index].1 = value.clone(),
                None => bindings.push((name.clone(), value.clone())),
            }
        }
        bindings.sort_by(|a, b| a.0.cmp(&b.0));
        bindings
    }
}

/// Define a binding in the root scope of the chain `env` belongs to
pub fn define_global(env: &EnvRef, name: &str, value: Value) {
    let mut scope = Rc::clone(env);
    loop {
        let parent = scope.borrow().parent.clone();
        match parent {
            Some(up) => scope = up,
            None => break,
        }
    }
    scope.borrow_mut().put(name, value);
}

/// A constructed-once evaluation context: the global scope, pre-populated
/// with every primitive from the builtin registry.
///
/// One `Session` corresponds to one interactive session (or one test
/// fixture); dropping it tears the global scope down along with any
/// closures only it kept alive.
pub struct Session {
    global: EnvRef,
}

impl Session {
    pub fn new() -> Session {
        let global = Env::empty();
        {
            let mut env = global.borrow_mut();
            for op in builtin_ops() {
                env.put(op.name, Value::Function(Function::Builtin(op)));
            }
        }
        Session { global }
    }

    /// Evaluate a value against this session's global scope
    pub fn eval(&self, value: Value) -> Value {
        eval(&self.global, value)
    }

    /// The session's global environment
    pub fn env(&self) -> &EnvRef {
        &self.global
    }
}

impl Default for Session {
    fn default() -> Self {
        Session::new()
    }
}

/// Evaluate a value in the given environment (public API)
pub fn eval(env: &EnvRef, value: Value) -> Value {
    eval_with_depth(env, value, 0)
}

/// Evaluate with depth tracking so runaway recursion becomes an Error value
/// instead of exhausting the host stack.
pub(crate) fn eval_with_depth(env: &EnvRef, value: Value, depth: usize) -> Value {
    if depth >= MAX_EVAL_DEPTH {
        return Value::error(format!(
            "Evaluation depth limit exceeded (max: {MAX_EVAL_DEPTH})"
        ));
    }
    match value {
        // Variable lookup: a copy of the binding, or an unbound-symbol error
        Value::Symbol(name) => match env.borrow().get(&name) {
            Some(bound) => bound,
            None => Value::error(format!("Unbound symbol '{name}'")),
        },

        // Application
        Value::SExpr(elements) => eval_sexpr(env, elements, depth),

        // Numbers, strings, Q-expressions, functions and errors all
        // evaluate to themselves
        other => other,
    }
}

/// Evaluate an S-expression: reduce the elements left to right, then apply.
fn eval_sexpr(env: &EnvRef, elements: Vec<Value>, depth: usize) -> Value {
    let mut evaluated = Vec::with_capacity(elements.len());
    for element in elements {
        let result = eval_with_depth(env, element, depth + 1);
        if result.is_error() {
            // First error by position wins; later elements are never evaluated
            return result;
        }
        evaluated.push(result);
    }

    match evaluated.len() {
        // An empty S-expression evaluates to itself
        0 => Value::SExpr(evaluated),
        // A single element evaluates to that element, whatever it is
        1 => evaluated.remove(0),
        _ => {
            let head = evaluated.remove(0);
            match head {
                Value::Function(function) => apply(env, function, evaluated, depth),
                other => Value::error(format!(
                    "S-Expression starts with incorrect type. Got {}, Expected Function.",
                    other.type_name()
                )),
            }
        }
    }
}

/// Apply a function to already-evaluated arguments
pub(crate) fn apply(env: &EnvRef, function: Function, args: Vec<Value>, depth: usize) -> Value {
    match function {
        Function::Builtin(op) => (op.func)(env, args, depth),
        Function::Closure(closure) => call_closure(env, closure, args, depth),
    }
}

/// Bind arguments to a closure's formals and either evaluate the body (all
/// formals bound) or return a partially applied closure (formals remain).
fn call_closure(env: &EnvRef, mut closure: Box<Closure>, mut args: Vec<Value>, depth: usize) -> Value {
    let given = args.len();
    let total = closure.formals.len();
    let variadic = matches!(closure.formals.last(), Some(Formal::Variadic(_)));

    // A variadic closure needs every required formal fed in one call; it
    // cannot be partially applied.
    if variadic && given + 1 < total {
        return Value::error(format!(
            "Function called with improper number of arguments. Got {given}, Expected {total}."
        ));
    }

    while !args.is_empty() {
        if closure.formals.is_empty() {
            return Value::error(format!(
                "Function passed too many arguments. Got {given}, Expected {total}."
            ));
        }
        match closure.formals.remove(0) {
            Formal::Variadic(name) => {
                // The trailing formal collects all remaining arguments
                let rest: Vec<Value> = args.drain(..).collect();
                closure.env.borrow_mut().put(&name, Value::QExpr(rest));
            }
            Formal::Required(name) => {
                let value = args.remove(0);
                closure.env.borrow_mut().put(&name, value);
            }
        }
    }

    // A trailing variadic formal with nothing left to feed it binds to {}
    if matches!(closure.formals.as_slice(), [Formal::Variadic(_)]) {
        if let Some(Formal::Variadic(name)) = closure.formals.pop() {
            closure.env.borrow_mut().put(&name, Value::QExpr(Vec::new()));
        }
    }

    if closure.formals.is_empty() {
        // Fully applied: resolve free variables through the caller's scope
        closure.env.borrow_mut().set_parent(Rc::clone(env));
        let body = std::mem::take(&mut closure.body);
        eval_with_depth(&closure.env, Value::SExpr(body), depth + 1)
    } else {
        // Partial application: consumed formals are gone, bound arguments
        // stay in the closure's private environment
        Value::Function(Function::Closure(closure))
    }
}
