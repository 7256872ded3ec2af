//! Concrete syntax tree to values.
//!
//! The reader is the thin adapter between the parser's generic
//! [`SyntaxNode`] trees and the evaluator's [`Value`] trees. Number
//! literals are range-checked here (an out-of-range literal reads as an
//! `Error` value, not a parse failure), and string literals lose their
//! surrounding quotes and have their escape sequences resolved.
//!
//! A `Root` node becomes an S-expression, so one line of input is one
//! application: `+ 1 2` at top level calls `+`, a bare `5` evaluates to
//! itself, and an empty line evaluates to `()`.

use crate::ast::{NumberType, Value};
use crate::syntax::{NodeTag, SyntaxNode, unescape};

/// Convert a syntax tree into a value tree
pub fn read(node: SyntaxNode) -> Value {
    match node.tag {
        NodeTag::Number => read_number(&node.text),
        NodeTag::Symbol => Value::Symbol(node.text),
        NodeTag::String => read_string(&node.text),
        NodeTag::SExpr | NodeTag::Root => Value::SExpr(read_children(node.children)),
        NodeTag::QExpr => Value::QExpr(read_children(node.children)),
    }
}

fn read_children(children: Vec<SyntaxNode>) -> Vec<Value> {
    children.into_iter().map(read).collect()
}

fn read_number(text: &str) -> Value {
    match text.parse::<NumberType>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::error("invalid number"),
    }
}

fn read_string(text: &str) -> Value {
    // The literal text still carries the surrounding quotes
    let interior = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    Value::String(unescape(interior))
}

#[cfg(test)]
#[expect(clippy::unwrap_used)] // test code OK
mod tests {
    use super::*;
    use crate::ast::{qexpr, sexpr, sym, val};
    use crate::syntax::parse_program;

    /// Parse and read a full line
    fn read_line(input: &str) -> Value {
        read(parse_program(input).unwrap())
    }

    /// Parse and read a line expected to hold exactly one expression
    fn read_one(input: &str) -> Value {
        match read_line(input) {
            Value::SExpr(mut items) if items.len() == 1 => items.remove(0),
            other => panic!("expected a single expression from '{input}', got {other:?}"),
        }
    }

    #[test]
    fn test_read_atoms() {
        assert_eq!(read_one("42"), val(42));
        assert_eq!(read_one("-17"), val(-17));
        assert_eq!(read_one("-9223372036854775808"), val(i64::MIN));
        assert_eq!(read_one("foo"), sym("foo"));
        assert_eq!(read_one("&"), sym("&"));
        assert_eq!(read_one("\"hello\""), val("hello"));
        assert_eq!(read_one("\"\""), val(""));
    }

    #[test]
    fn test_read_number_range_overflow() {
        // The parser accepts the literal; the reader rejects the range
        assert_eq!(read_one("99999999999999999999"), Value::error("invalid number"));
        assert_eq!(read_one("-99999999999999999999"), Value::error("invalid number"));
    }

    #[test]
    fn test_read_string_unescapes() {
        assert_eq!(read_one(r#""a\nb""#), val("a\nb"));
        assert_eq!(read_one(r#""q\"q""#), val("q\"q"));
        assert_eq!(read_one(r#""b\\b""#), val("b\\b"));
        assert_eq!(read_one(r#""t\tr\r""#), val("t\tr\r"));
    }

    #[test]
    fn test_read_structure() {
        // The root is an S-expression over the line's expressions
        assert_eq!(read_line(""), sexpr(vec![]));
        assert_eq!(read_line("5"), sexpr(vec![val(5)]));
        assert_eq!(
            read_line("+ 1 2"),
            sexpr(vec![sym("+"), val(1), val(2)])
        );
        assert_eq!(
            read_one("(head {1 2})"),
            sexpr(vec![sym("head"), qexpr(vec![val(1), val(2)])])
        );
        assert_eq!(
            read_one("{def {x} 1}"),
            qexpr(vec![sym("def"), qexpr(vec![sym("x")]), val(1)])
        );
        assert_eq!(read_one("()"), sexpr(vec![]));
    }

    #[test]
    fn test_print_read_round_trip() {
        // Printing a value and re-reading the printed text reproduces a
        // structurally equal value
        let inputs = [
            "42",
            "-17",
            "\"hello\"",
            r#""line\nbreak \"quoted\" back\\slash""#,
            "{}",
            "{1 2 3}",
            "{a {b \"c\"} -4}",
            "{x & xs}",
        ];
        for input in inputs {
            let value = read_one(input);
            let printed = value.to_string();
            let reread = read_one(&printed);
            assert_eq!(value, reread, "round-trip through '{printed}'");
            assert_eq!(printed, reread.to_string(), "second print of '{printed}'");
        }
    }
}
