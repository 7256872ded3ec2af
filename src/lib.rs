//! qlisp - a small Lisp with Q-expressions
//!
//! This crate implements a dynamically-typed Lisp in which quoted code is an
//! ordinary data type: a Q-expression (`{...}`) is a list that is never
//! evaluated, and every construct that would be a special form elsewhere
//! (`def`, `if`, `\`) is a plain function taking Q-expressions as arguments.
//!
//! ```lisp
//! (+ 1 2 3)                      ; arithmetic
//! (head {a b c})                 ; list manipulation, {a b c} stays literal
//! (def {x} 42)                   ; global definition
//! (fun {twice f x} {f (f x)})    ; named function definition
//! ((\ {x y} {+ x y}) 1)          ; partial application
//! ```
//!
//! Evaluation errors are first-class values: a fallible operation produces an
//! `Error` value in place of its result, and evaluating a compound expression
//! short-circuits at the first child that evaluates to an `Error`. Only
//! malformed *input text* is reported out of band, as a [`ParseError`].
//!
//! ## Modules
//!
//! - `syntax`: text to concrete syntax tree
//! - `reader`: concrete syntax tree to values
//! - `ast`: the value representation and printer
//! - `evaluator`: environments, sessions, and the evaluation engine
//! - `builtinops`: the fixed library of primitive operations

use std::fmt;

pub mod ast;
pub mod builtinops;
pub mod evaluator;
pub mod reader;
pub mod syntax;

/// Maximum parsing depth, limiting deeply nested expressions
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum evaluation depth, limiting runaway recursion during evaluation.
/// Set well above the parse depth to leave room for nested function calls.
pub const MAX_EVAL_DEPTH: usize = 256;

/// Categorizes the different kinds of parsing errors.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ParseErrorKind {
    /// Invalid or unexpected syntax (bad tokens, malformed expressions)
    InvalidSyntax,
    /// Input ended before the expression was complete (EOF, unterminated string, unclosed parens)
    Incomplete,
    /// Expression nesting exceeded the maximum parse depth
    TooDeeplyNested,
    /// Extra input found after a complete, valid expression
    TrailingContent,
}

/// A structured error describing a parsing failure.
///
/// Parse errors are a separate channel from evaluation errors: evaluation
/// errors are [`ast::Value::Error`] values, while text that never parsed has
/// no value representation at all.
#[derive(Debug, PartialEq, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    /// Context snippet from the input showing where the error occurred (max 100 chars)
    pub context: Option<String>,
    /// The problematic token or character encountered, if identifiable
    pub found: Option<String>,
}

impl ParseError {
    /// Create a ParseError with all fields
    pub fn new(
        kind: ParseErrorKind,
        message: impl Into<String>,
        context: Option<String>,
        found: Option<String>,
    ) -> Self {
        ParseError {
            kind,
            message: message.into(),
            context,
            found,
        }
    }

    /// Create a simple ParseError with a kind and message but no context
    pub fn from_message(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self::new(kind, message, None, None)
    }

    /// Create a ParseError with context extracted from input at a given offset
    pub fn with_context(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
    ) -> Self {
        Self::with_context_and_found(kind, message, input, error_offset, None)
    }

    /// Create a ParseError with context and found token
    pub fn with_context_and_found(
        kind: ParseErrorKind,
        message: impl Into<String>,
        input: &str,
        error_offset: usize,
        found: Option<String>,
    ) -> Self {
        const MAX_CONTEXT: usize = 100;

        // Show some context before the error position as well
        let context_start = error_offset.saturating_sub(20);

        let context_str: String = input
            .chars()
            .skip(context_start)
            .take(MAX_CONTEXT)
            .collect();

        let mut display_context = String::new();
        if context_start > 0 {
            display_context.push_str("[...]");
        }
        display_context.push_str(&context_str);
        if context_start + context_str.len() < input.len() {
            display_context.push_str("[...]");
        }

        // Newlines would garble the single-line error display
        let display_context = display_context.replace('\n', "\\n").replace('\r', "");

        Self::new(kind, message, Some(display_context), found)
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Parse error: {}", self.message)?;
        if let Some(found) = &self.found {
            write!(f, "\nFound: {found}")?;
        }
        if let Some(context) = &self.context {
            write!(f, "\nContext: {context}")?;
        }
        Ok(())
    }
}

/// Parse, read, and evaluate one unit of input in the given session.
///
/// This is the complete text-to-value pipeline used by the REPL: the input is
/// parsed into a syntax tree, read into a value, and evaluated against the
/// session's global environment. Evaluation failures are returned as ordinary
/// [`ast::Value::Error`] values inside `Ok`; only unparseable text is an `Err`.
pub fn eval_source(
    session: &evaluator::Session,
    input: &str,
) -> Result<ast::Value, ParseError> {
    let program = syntax::parse_program(input)?;
    Ok(session.eval(reader::read(program)))
}
