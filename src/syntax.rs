//! Text to concrete syntax tree.
//!
//! The parser knows nothing about evaluation: it produces a generic
//! [`SyntaxNode`] tree (a tag, the literal text, ordered children) that the
//! `reader` module turns into values. Numbers keep their literal text so
//! range checking can happen at read time, and string literals keep their
//! quotes and escape sequences so the reader applies [`unescape`] itself.
//!
//! Grammar:
//!
//! ```text
//! number : -?[0-9]+
//! symbol : [a-zA-Z0-9_+\-*/\\=<>!&|%]+
//! string : "(\.|[^"])*"
//! sexpr  : '(' expr* ')'
//! qexpr  : '{' expr* '}'
//! root   : expr*
//! ```
//!
//! Nesting is limited to [`MAX_PARSE_DEPTH`]; anything deeper is rejected
//! rather than risking the parser's own stack.

use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::take_while1,
    character::complete::{char, multispace0},
    combinator::{cut, opt, recognize},
    error::ErrorKind,
    multi::many0,
    sequence::{pair, preceded, terminated},
};

use crate::{MAX_PARSE_DEPTH, ParseError, ParseErrorKind};

/// What kind of node a [`SyntaxNode`] is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTag {
    Number,
    Symbol,
    String,
    SExpr,
    QExpr,
    /// The top level of one unit of input, holding its expressions in order
    Root,
}

/// A node of the concrete syntax tree: a tag, the literal text (leaves
/// only), and ordered children (branches only).
#[derive(Debug, Clone, PartialEq)]
pub struct SyntaxNode {
    pub tag: NodeTag,
    pub text: String,
    pub children: Vec<SyntaxNode>,
}

impl SyntaxNode {
    fn leaf(tag: NodeTag, text: &str) -> SyntaxNode {
        SyntaxNode {
            tag,
            text: text.to_owned(),
            children: Vec::new(),
        }
    }

    fn branch(tag: NodeTag, children: Vec<SyntaxNode>) -> SyntaxNode {
        SyntaxNode {
            tag,
            text: String::new(),
            children,
        }
    }
}

/// Allowed non-alphanumeric characters in symbol names. Covers every
/// operator identifier in the builtin library, the lambda symbol `\`, and
/// the variadic marker `&`.
const SYMBOL_SPECIAL_CHARS: &str = "_+-*/\\=<>!&|%";

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c)
}

/// Parse a number literal. The text is kept verbatim; range checking is the
/// reader's job.
fn parse_number(input: &str) -> IResult<&str, SyntaxNode> {
    let (rest, text) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;
    Ok((rest, SyntaxNode::leaf(NodeTag::Number, text)))
}

/// Parse a symbol (identifier)
fn parse_symbol(input: &str) -> IResult<&str, SyntaxNode> {
    let (rest, text) = take_while1(is_symbol_char).parse(input)?;
    Ok((rest, SyntaxNode::leaf(NodeTag::Symbol, text)))
}

/// Parse a string literal, keeping quotes and escapes in the literal text.
///
/// Once the opening quote has been consumed the parse is committed: a bad
/// escape or a missing closing quote is a hard failure, not a fallthrough
/// to some other alternative.
fn parse_string(input: &str) -> IResult<&str, SyntaxNode> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                ErrorKind::Char,
            )));
        }
    }
    loop {
        match chars.next() {
            Some((end, '"')) => {
                let text = &input[..=end];
                return Ok((&input[end + 1..], SyntaxNode::leaf(NodeTag::String, text)));
            }
            Some((escape_start, '\\')) => match chars.next() {
                Some((_, 'n' | 't' | 'r' | '\\' | '"' | '\'')) => {}
                Some(_) => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        &input[escape_start..],
                        ErrorKind::Escaped,
                    )));
                }
                None => {
                    return Err(nom::Err::Failure(nom::error::Error::new(
                        &input[input.len()..],
                        ErrorKind::Char,
                    )));
                }
            },
            Some(_) => {}
            None => {
                // Unterminated: report at end of input
                return Err(nom::Err::Failure(nom::error::Error::new(
                    &input[input.len()..],
                    ErrorKind::Char,
                )));
            }
        }
    }
}

/// Parse a delimited sequence of expressions
fn parse_seq(
    input: &str,
    open: char,
    close: char,
    tag: NodeTag,
    depth: usize,
) -> IResult<&str, SyntaxNode> {
    let (input, _) = char(open).parse(input)?;
    let (input, children) =
        many0(preceded(multispace0, |i| parse_expr(i, depth + 1))).parse(input)?;
    // The opener committed us to this sequence: a missing closer is a hard
    // failure, not a reason to try another alternative
    let (input, _) = preceded(multispace0, cut(char(close))).parse(input)?;
    Ok((input, SyntaxNode::branch(tag, children)))
}

/// Parse one expression at the given nesting depth
fn parse_expr(input: &str, depth: usize) -> IResult<&str, SyntaxNode> {
    if depth >= MAX_PARSE_DEPTH {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    alt((
        |i| parse_seq(i, '(', ')', NodeTag::SExpr, depth),
        |i| parse_seq(i, '{', '}', NodeTag::QExpr, depth),
        parse_number,
        parse_string,
        parse_symbol,
    ))
    .parse(input)
}

/// First few characters of the remaining input, for error reporting
fn snippet(remaining: &str) -> String {
    remaining.chars().take(10).collect()
}

/// Convert a nom error into a structured [`ParseError`]
fn parse_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => ParseError::with_context(
                    ParseErrorKind::TooDeeplyNested,
                    format!("Expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                    input,
                    offset,
                ),
                ErrorKind::Escaped => ParseError::with_context_and_found(
                    ParseErrorKind::InvalidSyntax,
                    "Invalid escape sequence in string literal",
                    input,
                    offset,
                    Some(snippet(e.input)),
                ),
                _ => {
                    if offset < input.len() {
                        ParseError::with_context_and_found(
                            ParseErrorKind::InvalidSyntax,
                            format!("Invalid syntax near '{}'", snippet(e.input)),
                            input,
                            offset,
                            Some(snippet(e.input)),
                        )
                    } else {
                        ParseError::with_context(
                            ParseErrorKind::Incomplete,
                            "Unexpected end of input",
                            input,
                            offset,
                        )
                    }
                }
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::from_message(ParseErrorKind::Incomplete, "Incomplete input")
        }
    }
}

/// Parse one unit of input (a line, typically) into a `Root` node holding
/// its zero or more top-level expressions.
pub fn parse_program(input: &str) -> Result<SyntaxNode, ParseError> {
    let parsed = terminated(
        many0(preceded(multispace0, |i| parse_expr(i, 0))),
        multispace0,
    )
    .parse(input);

    match parsed {
        Ok(("", children)) => Ok(SyntaxNode::branch(NodeTag::Root, children)),
        Ok((remaining, _)) => {
            // Something stopped the expression list early; re-running the
            // expression parser on the leftover pinpoints why.
            match parse_expr(remaining, 0) {
                Err(error) => Err(parse_error(input, error)),
                Ok(_) => Err(ParseError::with_context_and_found(
                    ParseErrorKind::TrailingContent,
                    "Unexpected input after expression",
                    input,
                    input.len() - remaining.len(),
                    Some(snippet(remaining)),
                )),
            }
        }
        Err(error) => Err(parse_error(input, error)),
    }
}

/// Resolve the escape sequences of a string literal's interior text.
///
/// The parser has already validated the escape set, so this transform is
/// total; an unknown escape degrades to its raw character.
pub(crate) fn unescape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('\\') => result.push('\\'),
            Some('"') => result.push('"'),
            Some('\'') => result.push('\''),
            Some(other) => result.push(other),
            None => {}
        }
    }
    result
}
