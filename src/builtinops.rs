//! Built-in operations registry.
//!
//! Every primitive of the language lives in one table, [`BUILTIN_OPS`],
//! indexed by name. A session's global environment is populated from the
//! table at construction time, so builtins are ordinary function values that
//! can be passed around, compared, and shadowed locally like anything else.
//!
//! All primitives share one signature: the invoking environment, the
//! already-evaluated argument list, and the current evaluation depth budget
//! (needed by the few operations that re-enter the evaluator, such as `eval`
//! and `if`). There are no special forms - operations that need unevaluated
//! code take Q-expressions, which evaluate to themselves.
//!
//! ## Error Handling
//!
//! Argument checks (type, arity, emptiness, reserved-name) run eagerly
//! before any work happens; on failure the argument list is discarded and a
//! formatted `Error` value names the function, the offending condition, and
//! expected vs. actual counts or types. Arithmetic is checked: overflow,
//! division by zero and modulo by zero all produce `Error` values.
//!
//! ## Adding New Operations
//!
//! 1. Implement the function following the signature
//!    `fn(&EnvRef, Vec<Value>, usize) -> Value`
//! 2. Add it to `BUILTIN_OPS` with its name and reserved flag
//! 3. Add test coverage for its edge cases and error conditions

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::ast::{Closure, Formal, Function, NumberType, Value};
use crate::evaluator::{EnvRef, define_global, eval_with_depth};

/// Canonical signature shared by every primitive
pub type BuiltinFn = fn(&EnvRef, Vec<Value>, usize) -> Value;

/// Definition of a built-in operation
pub struct BuiltinOp {
    /// The identifier this operation is bound to in the global scope
    pub name: &'static str,
    /// The implementation
    pub func: BuiltinFn,
    /// Reserved names cannot be rebound through the global-definition form
    pub reserved: bool,
}

impl std::fmt::Debug for BuiltinOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "BuiltinOp({})", self.name)
    }
}

impl PartialEq for BuiltinOp {
    fn eq(&self, other: &Self) -> bool {
        // The name uniquely identifies a primitive
        self.name == other.name
    }
}

//
// Argument-check helpers
//

/// Bail out with an Error value when a condition does not hold
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !($cond) {
            return Value::error(format!($($arg)+));
        }
    };
}

/// Bail out with the canonical arity error unless the argument count matches
macro_rules! ensure_arity {
    ($func:expr, $args:expr, $expected:expr) => {
        if $args.len() != $expected {
            return arity_err($func, $args.len(), $expected);
        }
    };
}

fn arity_err(func: &str, got: usize, expected: usize) -> Value {
    Value::error(format!(
        "Function '{func}' passed incorrect number of arguments. Got {got}, Expected {expected}."
    ))
}

fn type_err(func: &str, index: usize, got: &Value, expected: &str) -> Value {
    Value::error(format!(
        "Function '{func}' passed incorrect type for argument {index}. Got {}, Expected {expected}.",
        got.type_name()
    ))
}

//
// List operations
//

fn builtin_list(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    Value::QExpr(args)
}

fn builtin_head(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("head", args, 1);
    let mut items = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("head", 0, &other, "Q-Expression"),
    };
    ensure!(!items.is_empty(), "Function 'head' passed {{}}!");
    items.truncate(1);
    Value::QExpr(items)
}

fn builtin_tail(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("tail", args, 1);
    let mut items = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("tail", 0, &other, "Q-Expression"),
    };
    ensure!(!items.is_empty(), "Function 'tail' passed {{}}!");
    items.remove(0);
    Value::QExpr(items)
}

fn builtin_init(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("init", args, 1);
    let mut items = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("init", 0, &other, "Q-Expression"),
    };
    ensure!(!items.is_empty(), "Function 'init' passed {{}}!");
    items.pop();
    Value::QExpr(items)
}

fn builtin_join(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    let mut joined = Vec::new();
    for (index, arg) in args.into_iter().enumerate() {
        match arg {
            Value::QExpr(items) => joined.extend(items),
            other => return type_err("join", index, &other, "Q-Expression"),
        }
    }
    Value::QExpr(joined)
}

fn builtin_cons(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("cons", args, 2);
    let tail = match args.remove(1) {
        Value::QExpr(items) => items,
        other => return type_err("cons", 1, &other, "Q-Expression"),
    };
    let head = args.remove(0);
    let mut items = Vec::with_capacity(tail.len() + 1);
    items.push(head);
    items.extend(tail);
    Value::QExpr(items)
}

fn builtin_len(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("len", args, 1);
    match args.remove(0) {
        Value::QExpr(items) => Value::Number(items.len() as NumberType),
        other => type_err("len", 0, &other, "Q-Expression"),
    }
}

fn builtin_eval(env: &EnvRef, mut args: Vec<Value>, depth: usize) -> Value {
    ensure_arity!("eval", args, 1);
    match args.remove(0) {
        // Relabel the Q-expression as an S-expression and evaluate it
        Value::QExpr(items) => eval_with_depth(env, Value::SExpr(items), depth + 1),
        other => type_err("eval", 0, &other, "Q-Expression"),
    }
}

//
// Definition forms
//

fn builtin_def(env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    bind_symbols(env, args, "def")
}

fn builtin_put(env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    bind_symbols(env, args, "=")
}

/// Shared implementation of `def` (root scope) and `=` (current scope):
/// a Q-expression of symbols followed by one value per symbol.
fn bind_symbols(env: &EnvRef, mut args: Vec<Value>, func: &str) -> Value {
    ensure!(
        !args.is_empty(),
        "Function '{func}' passed incorrect number of arguments. Got 0, Expected 1."
    );
    let symbols = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err(func, 0, &other, "Q-Expression"),
    };

    let mut names = Vec::with_capacity(symbols.len());
    for item in &symbols {
        match item {
            Value::Symbol(name) => names.push(name.clone()),
            other => {
                return Value::error(format!(
                    "Function '{func}' cannot define non-symbol. Got {}, Expected Symbol.",
                    other.type_name()
                ));
            }
        }
    }

    ensure!(
        names.len() == args.len(),
        "Function '{func}' passed too many arguments for symbols. Got {}, Expected {}.",
        names.len(),
        args.len()
    );

    // All checks run before the first binding happens
    if func == "def" {
        for name in &names {
            ensure!(
                !is_reserved(name),
                "Redefinition of builtin '{name}' is not allowed"
            );
        }
    }

    for (name, value) in names.into_iter().zip(args) {
        if func == "def" {
            define_global(env, &name, value);
        } else {
            env.borrow_mut().put(&name, value);
        }
    }

    Value::SExpr(Vec::new())
}

//
// Closure construction
//

/// Resolve a formals Q-expression into typed formals, rejecting non-symbols
/// and a misplaced variadic marker.
fn parse_formals(items: Vec<Value>) -> Result<Vec<Formal>, Value> {
    let mut names = Vec::with_capacity(items.len());
    for item in items {
        match item {
            Value::Symbol(name) => names.push(name),
            other => {
                return Err(Value::error(format!(
                    "Cannot define non-symbol. Got {}, Expected Symbol.",
                    other.type_name()
                )));
            }
        }
    }

    let mut formals = Vec::with_capacity(names.len());
    let mut names = names.into_iter();
    while let Some(name) = names.next() {
        if name == "&" {
            // The marker must be followed by exactly one trailing symbol
            let trailing = match names.next() {
                Some(trailing) if trailing != "&" => trailing,
                _ => return Err(Value::error("Symbol '&' not followed by single symbol.")),
            };
            if names.next().is_some() {
                return Err(Value::error("Symbol '&' not followed by single symbol."));
            }
            formals.push(Formal::Variadic(trailing));
        } else {
            formals.push(Formal::Required(name));
        }
    }
    Ok(formals)
}

fn builtin_lambda(_env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("\\", args, 2);
    let formals_list = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("\\", 0, &other, "Q-Expression"),
    };
    let body = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("\\", 1, &other, "Q-Expression"),
    };
    let formals = match parse_formals(formals_list) {
        Ok(formals) => formals,
        Err(error) => return error,
    };
    Value::Function(Function::Closure(Box::new(Closure::new(formals, body))))
}

fn builtin_fun(env: &EnvRef, mut args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("fun", args, 2);
    let mut header = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("fun", 0, &other, "Q-Expression"),
    };
    let body = match args.remove(0) {
        Value::QExpr(items) => items,
        other => return type_err("fun", 1, &other, "Q-Expression"),
    };
    ensure!(!header.is_empty(), "Function 'fun' passed {{}}!");
    let name = match header.remove(0) {
        Value::Symbol(name) => name,
        other => {
            return Value::error(format!(
                "Function 'fun' cannot define non-symbol. Got {}, Expected Symbol.",
                other.type_name()
            ));
        }
    };
    let formals = match parse_formals(header) {
        Ok(formals) => formals,
        Err(error) => return error,
    };
    ensure!(
        !is_reserved(&name),
        "Redefinition of builtin '{name}' is not allowed"
    );
    let closure = Value::Function(Function::Closure(Box::new(Closure::new(formals, body))));
    define_global(env, &name, closure);
    Value::SExpr(Vec::new())
}

//
// Conditional
//

fn builtin_if(env: &EnvRef, mut args: Vec<Value>, depth: usize) -> Value {
    ensure_arity!("if", args, 3);
    let condition = match &args[0] {
        Value::Number(n) => *n,
        other => return type_err("if", 0, other, "Number"),
    };
    for index in [1, 2] {
        if !matches!(args[index], Value::QExpr(_)) {
            return type_err("if", index, &args[index], "Q-Expression");
        }
    }
    let chosen = if condition != 0 {
        args.swap_remove(1)
    } else {
        args.swap_remove(2)
    };
    match chosen {
        // The chosen branch is relabeled as an S-expression and evaluated
        Value::QExpr(items) => eval_with_depth(env, Value::SExpr(items), depth + 1),
        other => type_err("if", 1, &other, "Q-Expression"),
    }
}

//
// Arithmetic
//

/// Left fold over numeric arguments with a checked step function
fn fold_numeric(
    func: &str,
    args: Vec<Value>,
    step: impl Fn(NumberType, NumberType) -> Result<NumberType, &'static str>,
) -> Value {
    for (index, arg) in args.iter().enumerate() {
        if !matches!(arg, Value::Number(_)) {
            return type_err(func, index, arg, "Number");
        }
    }
    let mut numbers = args.into_iter().filter_map(|arg| match arg {
        Value::Number(n) => Some(n),
        _ => None,
    });
    let Some(mut acc) = numbers.next() else {
        return arity_err(func, 0, 1);
    };
    for operand in numbers {
        match step(acc, operand) {
            Ok(next) => acc = next,
            Err(message) => return Value::error(message),
        }
    }
    Value::Number(acc)
}

fn builtin_add(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    fold_numeric("+", args, |acc, n| {
        acc.checked_add(n).ok_or("Integer overflow in addition")
    })
}

fn builtin_sub(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    // A single operand is unary negation
    if let [Value::Number(n)] = args.as_slice() {
        return match n.checked_neg() {
            Some(negated) => Value::Number(negated),
            None => Value::error("Integer overflow in negation"),
        };
    }
    fold_numeric("-", args, |acc, n| {
        acc.checked_sub(n).ok_or("Integer overflow in subtraction")
    })
}

fn builtin_mul(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    fold_numeric("*", args, |acc, n| {
        acc.checked_mul(n).ok_or("Integer overflow in multiplication")
    })
}

fn builtin_div(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    fold_numeric("/", args, |acc, n| {
        if n == 0 {
            Err("Division By Zero!")
        } else {
            acc.checked_div(n).ok_or("Integer overflow in division")
        }
    })
}

fn builtin_mod(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    fold_numeric("%", args, |acc, n| {
        if n == 0 {
            Err("Modulo By Zero!")
        } else {
            acc.checked_rem(n).ok_or("Integer overflow in modulo")
        }
    })
}

//
// Comparison
//

/// Structural equality over any two values
fn structural_cmp(func: &str, args: &[Value], negate: bool) -> Value {
    if args.len() != 2 {
        return arity_err(func, args.len(), 2);
    }
    let equal = args[0] == args[1];
    Value::Number(NumberType::from(equal != negate))
}

fn builtin_eq(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    structural_cmp("==", &args, false)
}

fn builtin_ne(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    structural_cmp("!=", &args, true)
}

// Macro to generate the numeric ordering functions
macro_rules! numeric_ordering {
    ($name:ident, $op:tt, $op_name:expr) => {
        fn $name(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
            ensure_arity!($op_name, args, 2);
            match (&args[0], &args[1]) {
                (Value::Number(a), Value::Number(b)) => Value::Number(NumberType::from(a $op b)),
                (Value::Number(_), other) => type_err($op_name, 1, other, "Number"),
                (other, _) => type_err($op_name, 0, other, "Number"),
            }
        }
    };
}

numeric_ordering!(builtin_gt, >, ">");
numeric_ordering!(builtin_lt, <, "<");
numeric_ordering!(builtin_ge, >=, ">=");
numeric_ordering!(builtin_le, <=, "<=");

//
// Boolean logic (numbers; non-zero is true, results are 1 or 0)
//

macro_rules! logic_op {
    ($name:ident, $op_name:expr, $op:tt) => {
        fn $name(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
            for (index, arg) in args.iter().enumerate() {
                if !matches!(arg, Value::Number(_)) {
                    return type_err($op_name, index, arg, "Number");
                }
            }
            let mut truths = args.into_iter().filter_map(|arg| match arg {
                Value::Number(n) => Some(n != 0),
                _ => None,
            });
            let Some(mut result) = truths.next() else {
                return arity_err($op_name, 0, 1);
            };
            for operand in truths {
                result = result $op operand;
            }
            Value::Number(NumberType::from(result))
        }
    };
}

logic_op!(builtin_and, "&&", &&);
logic_op!(builtin_or, "||", ||);

fn builtin_not(_env: &EnvRef, args: Vec<Value>, _depth: usize) -> Value {
    ensure_arity!("!", args, 1);
    match &args[0] {
        Value::Number(n) => Value::Number(NumberType::from(*n == 0)),
        other => type_err("!", 0, other, "Number"),
    }
}

//
// Registry
//

/// The fixed table of primitive operations, installed into every session's
/// global scope. Every entry except `if` is a reserved name.
static BUILTIN_OPS: LazyLock<Vec<BuiltinOp>> = LazyLock::new(|| {
    fn op(name: &'static str, func: BuiltinFn) -> BuiltinOp {
        BuiltinOp {
            name,
            func,
            reserved: true,
        }
    }

    vec![
        // List functions
        op("list", builtin_list),
        op("head", builtin_head),
        op("tail", builtin_tail),
        op("eval", builtin_eval),
        op("join", builtin_join),
        op("cons", builtin_cons),
        op("init", builtin_init),
        op("len", builtin_len),
        // Definition forms
        op("def", builtin_def),
        op("=", builtin_put),
        op("\\", builtin_lambda),
        op("fun", builtin_fun),
        // Arithmetic
        op("+", builtin_add),
        op("-", builtin_sub),
        op("*", builtin_mul),
        op("/", builtin_div),
        op("%", builtin_mod),
        // Conditional: the one name global definition may rebind
        BuiltinOp {
            name: "if",
            func: builtin_if,
            reserved: false,
        },
        // Comparison
        op("==", builtin_eq),
        op("!=", builtin_ne),
        op(">", builtin_gt),
        op("<", builtin_lt),
        op(">=", builtin_ge),
        op("<=", builtin_le),
        // Logic
        op("&&", builtin_and),
        op("||", builtin_or),
        op("!", builtin_not),
    ]
});

/// Lazy static map from name to BuiltinOp
static BUILTIN_INDEX: LazyLock<HashMap<&'static str, &'static BuiltinOp>> = LazyLock::new(|| {
    let ops: &'static [BuiltinOp] = BUILTIN_OPS.as_slice();
    ops.iter().map(|op| (op.name, op)).collect()
});

/// All builtin operations, in installation order
pub(crate) fn builtin_ops() -> &'static [BuiltinOp] {
    BUILTIN_OPS.as_slice()
}

/// Find a builtin operation by name
pub fn find_builtin(name: &str) -> Option<&'static BuiltinOp> {
    BUILTIN_INDEX.get(name).copied()
}

/// Whether a name belongs to the reserved set that `def` refuses to rebind
pub(crate) fn is_reserved(name: &str) -> bool {
    find_builtin(name).is_some_and(|op| op.reserved)
}
