//! This module defines the value representation of the interpreter. The main
//! enum, [`Value`], covers every data type of the language: numbers, errors,
//! symbols, strings, functions, S-expressions and Q-expressions. Functions
//! split into [`Function::Builtin`] (a reference into the primitive registry)
//! and [`Function::Closure`] (formals, body, and a private environment).
//!
//! Equality is structural throughout; two closures compare equal when their
//! formals and bodies match, regardless of their captured environments.
//! Cloning is a deep copy: list values copy every element, and closures copy
//! their environment's bindings while sharing its parent by reference, so no
//! two distinct value trees ever alias each other's contents.
//!
//! The `Display` impl is the printer: it renders values back into the
//! surface syntax (strings re-escaped and quoted, S-expressions
//! parenthesized, Q-expressions brace-wrapped).

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::builtinops::BuiltinOp;
use crate::evaluator::{Env, EnvRef};

/// Type alias for number values in the interpreter
pub(crate) type NumberType = i64;

/// A formal parameter of a closure.
///
/// The `&` marker of the surface syntax is resolved into a distinguished
/// formal kind when the closure is constructed; it is never stored as a
/// sentinel symbol. A `Variadic` formal only ever appears in last position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formal {
    /// A positional parameter bound to exactly one argument
    Required(String),
    /// A trailing parameter bound to a Q-expression of all remaining arguments
    Variadic(String),
}

impl Formal {
    pub fn name(&self) -> &str {
        match self {
            Formal::Required(name) | Formal::Variadic(name) => name,
        }
    }
}

impl fmt::Display for Formal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formal::Required(name) => write!(f, "{name}"),
            Formal::Variadic(name) => write!(f, "& {name}"),
        }
    }
}

/// A user-defined function: formals, body, and a private environment.
///
/// The environment holds arguments bound so far (partial application leaves
/// consumed formals' bindings here) and gains the invoking environment as its
/// parent once the closure is fully applied.
pub struct Closure {
    pub formals: Vec<Formal>,
    pub body: Vec<Value>,
    pub env: EnvRef,
}

impl Closure {
    pub fn new(formals: Vec<Formal>, body: Vec<Value>) -> Closure {
        Closure {
            formals,
            body,
            env: Env::empty(),
        }
    }
}

impl Clone for Closure {
    /// Deep copy: the environment's bindings are duplicated so that two
    /// copies of one closure never share argument-binding state, while the
    /// parent link is carried over by reference.
    fn clone(&self) -> Self {
        Closure {
            formals: self.formals.clone(),
            body: self.body.clone(),
            env: Rc::new(RefCell::new(self.env.borrow().clone())),
        }
    }
}

impl PartialEq for Closure {
    /// Captured environments are excluded from comparison.
    fn eq(&self, other: &Self) -> bool {
        self.formals == other.formals && self.body == other.body
    }
}

/// A callable value: a primitive from the builtin registry, or a closure.
#[derive(Clone)]
pub enum Function {
    Builtin(&'static BuiltinOp),
    Closure(Box<Closure>),
}

impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Builtins are equal iff they reference the same primitive
            (Function::Builtin(a), Function::Builtin(b)) => a.name == b.name,
            (Function::Closure(a), Function::Closure(b)) => a == b,
            _ => false,
        }
    }
}

/// Core value type of the interpreter.
///
/// Exactly one variant is active at a time and every operation dispatches
/// exhaustively over the seven kinds. Errors are ordinary values: evaluation
/// never throws, it produces an `Error` in place of a result.
#[derive(Clone, PartialEq)]
pub enum Value {
    /// Numbers (integers only)
    Number(NumberType),
    /// First-class evaluation errors
    Error(String),
    /// Symbols (identifiers)
    Symbol(String),
    /// String literals, stored unescaped
    String(String),
    /// Builtin functions and closures
    Function(Function),
    /// S-expressions: evaluated as function application
    SExpr(Vec<Value>),
    /// Q-expressions: literal lists, never evaluated
    QExpr(Vec<Value>),
}

impl Value {
    /// Construct an Error value
    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(message.into())
    }

    pub(crate) fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Human-readable name of a value's type, as used in error messages
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Error(_) => "Error",
            Value::Symbol(_) => "Symbol",
            Value::String(_) => "String",
            Value::Function(_) => "Function",
            Value::SExpr(_) => "S-Expression",
            Value::QExpr(_) => "Q-Expression",
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "Number({n})"),
            Value::Error(message) => write!(f, "Error({message:?})"),
            Value::Symbol(s) => write!(f, "Symbol({s})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Function(Function::Builtin(op)) => write!(f, "Builtin({})", op.name),
            Value::Function(Function::Closure(closure)) => {
                write!(
                    f,
                    "Closure(formals={:?}, body={:?})",
                    closure.formals, closure.body
                )
            }
            Value::SExpr(elements) => write_debug_seq(f, "SExpr", elements),
            Value::QExpr(elements) => write_debug_seq(f, "QExpr", elements),
        }
    }
}

fn write_debug_seq(f: &mut fmt::Formatter<'_>, label: &str, elements: &[Value]) -> fmt::Result {
    write!(f, "{label}(")?;
    for (index, element) in elements.iter().enumerate() {
        if index > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{element:?}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Error(message) => write!(f, "Error: {message}"),
            Value::Symbol(s) => write!(f, "{s}"),
            Value::String(s) => {
                write!(f, "\"")?;
                for ch in s.chars() {
                    match ch {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        '\r' => write!(f, "\\r")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
            Value::Function(Function::Builtin(op)) => write!(f, "<builtin '{}'>", op.name),
            Value::Function(Function::Closure(closure)) => {
                write!(f, "(\\ ")?;
                write_items(f, &closure.formals, '{', '}')?;
                write!(f, " ")?;
                write_items(f, &closure.body, '{', '}')?;
                write!(f, ")")
            }
            Value::SExpr(elements) => write_items(f, elements, '(', ')'),
            Value::QExpr(elements) => write_items(f, elements, '{', '}'),
        }
    }
}

/// Render a space-separated sequence between delimiters, with no trailing
/// separator after the last element.
fn write_items<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    open: char,
    close: char,
) -> fmt::Result {
    write!(f, "{open}")?;
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            write!(f, " ")?;
        }
        write!(f, "{item}")?;
    }
    write!(f, "{close}")
}

// From trait implementations for Value - enables .into() conversion

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(n as NumberType)
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType); // Special case - no casting
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

/// Helper function for creating symbols in tests and literals
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sym<S: AsRef<str>>(name: S) -> Value {
    Value::Symbol(name.as_ref().to_owned())
}

/// Helper function for creating Values from Rust literals
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn val<T: Into<Value>>(value: T) -> Value {
    value.into()
}

/// Helper function for creating Q-expressions
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn qexpr(items: Vec<Value>) -> Value {
    Value::QExpr(items)
}

/// Helper function for creating S-expressions
#[cfg_attr(not(test), expect(dead_code))]
pub(crate) fn sexpr(items: Vec<Value>) -> Value {
    Value::SExpr(items)
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::builtinops::find_builtin;

    fn plus() -> Value {
        Value::Function(Function::Builtin(find_builtin("+").unwrap()))
    }

    #[test]
    fn test_helper_constructors() {
        assert_eq!(val(42), Value::Number(42));
        assert_eq!(val(-17i64), Value::Number(-17));
        assert_eq!(val(255u8), Value::Number(255));
        assert_eq!(val("hello"), Value::String("hello".to_owned()));
        assert_eq!(val(String::from("x")), Value::String("x".to_owned()));
        assert_eq!(sym("foo"), Value::Symbol("foo".to_owned()));
        assert_eq!(sym(String::from("&")), Value::Symbol("&".to_owned()));
        assert_eq!(qexpr(vec![]), Value::QExpr(vec![]));
        assert_eq!(
            sexpr(vec![sym("+"), val(1), val(2)]),
            Value::SExpr(vec![
                Value::Symbol("+".to_owned()),
                Value::Number(1),
                Value::Number(2),
            ])
        );
    }

    #[test]
    fn test_structural_equality() {
        // Same variant, same content
        assert_eq!(val(5), val(5));
        assert_eq!(val("a"), val("a"));
        assert_eq!(
            qexpr(vec![val(1), val(2), val(3)]),
            qexpr(vec![val(1), val(2), val(3)])
        );

        // Different variants are never equal
        assert_ne!(val(1), val("1"));
        assert_ne!(sym("x"), val("x"));
        assert_ne!(qexpr(vec![val(1)]), sexpr(vec![val(1)]));

        // Lists of different lengths or elements
        assert_ne!(qexpr(vec![val(1), val(2)]), qexpr(vec![val(1), val(2), val(3)]));
        assert_ne!(qexpr(vec![val(1)]), qexpr(vec![val(2)]));

        // Errors compare by exact text
        assert_eq!(Value::error("boom"), Value::error("boom"));
        assert_ne!(Value::error("boom"), Value::error("bang"));
    }

    #[test]
    fn test_function_equality() {
        // Two references to the same primitive are equal
        assert_eq!(plus(), plus());
        assert_ne!(
            plus(),
            Value::Function(Function::Builtin(find_builtin("-").unwrap()))
        );

        // Independently constructed closures with identical formals and
        // bodies compare equal; their environments are ignored.
        let make = || {
            Closure::new(
                vec![Formal::Required("x".to_owned())],
                vec![sym("+"), sym("x"), val(1)],
            )
        };
        let a = make();
        let b = make();
        b.env.borrow_mut().put("x", val(99));
        assert_eq!(
            Value::Function(Function::Closure(Box::new(a))),
            Value::Function(Function::Closure(Box::new(b)))
        );

        // Different formal kinds are unequal even with matching names
        let required = Closure::new(vec![Formal::Required("x".to_owned())], vec![sym("x")]);
        let variadic = Closure::new(vec![Formal::Variadic("x".to_owned())], vec![sym("x")]);
        assert_ne!(
            Value::Function(Function::Closure(Box::new(required))),
            Value::Function(Function::Closure(Box::new(variadic)))
        );

        // Builtins never equal closures
        let closure = Closure::new(vec![], vec![val(1)]);
        assert_ne!(plus(), Value::Function(Function::Closure(Box::new(closure))));
    }

    #[test]
    fn test_closure_clone_is_deep() {
        let original = Closure::new(
            vec![Formal::Required("y".to_owned())],
            vec![sym("+"), sym("x"), sym("y")],
        );
        original.env.borrow_mut().put("x", val(1));

        let copy = original.clone();
        copy.env.borrow_mut().put("x", val(2));

        // The copy's rebinding must not leak into the original's environment
        assert_eq!(original.env.borrow().get("x"), Some(val(1)));
        assert_eq!(copy.env.borrow().get("x"), Some(val(2)));
    }

    #[test]
    fn test_display_rendering() {
        let cases: Vec<(Value, &str)> = vec![
            (val(42), "42"),
            (val(-7), "-7"),
            (val("hello"), "\"hello\""),
            (val("a\"b\\c\nd"), "\"a\\\"b\\\\c\\nd\""),
            (sym("head"), "head"),
            (Value::error("boom"), "Error: boom"),
            (sexpr(vec![]), "()"),
            (qexpr(vec![]), "{}"),
            (
                sexpr(vec![sym("+"), val(1), qexpr(vec![val(2), val(3)])]),
                "(+ 1 {2 3})",
            ),
            (plus(), "<builtin '+'>"),
        ];
        for (value, expected) in cases {
            assert_eq!(format!("{value}"), expected);
        }
    }

    #[test]
    fn test_display_closure() {
        let closure = Closure::new(
            vec![
                Formal::Required("x".to_owned()),
                Formal::Variadic("xs".to_owned()),
            ],
            vec![sym("join"), qexpr(vec![sym("x")]), sym("xs")],
        );
        let rendered = format!("{}", Value::Function(Function::Closure(Box::new(closure))));
        assert_eq!(rendered, "(\\ {x & xs} {join {x} xs})");
    }
}
