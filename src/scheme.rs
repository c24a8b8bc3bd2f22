//! S-expression reading: source text to heap values.
//!
//! The reader is an external collaborator of the evaluator core - the core
//! only ever sees already-parsed values. Parsing happens in two steps: nom
//! combinators build an owned datum tree, and a lowering pass interns
//! symbols and allocates pairs in the heap. Keeping nom out of the heap
//! makes the combinators plain functions.
//!
//! Supported syntax: decimal and `#x` hexadecimal integers, reals,
//! `#t`/`#f`, strings with escape sequences, symbols, proper lists, dotted
//! pairs `(a . b)`, and the `'datum` quote shorthand. Nesting is limited
//! by [`MAX_PARSE_DEPTH`]. `;` comments can be stripped first via
//! [`ParseConfig`].

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{opt, recognize, value},
    error::ErrorKind,
    multi::separated_list0,
    sequence::{pair, preceded, terminated, tuple},
    IResult, Parser,
};

use crate::heap::Heap;
use crate::value::Value;
use crate::{Error, ParseError, ParseErrorKind, MAX_PARSE_DEPTH};

/// Allowed non-alphanumeric characters in symbol names.
pub(crate) const SYMBOL_SPECIAL_CHARS: &str = "+-*/<>=!?_$";

/// Check if a string is a valid symbol name: non-empty, no leading digit,
/// no "-digit" prefix, alphanumeric + SYMBOL_SPECIAL_CHARS.
pub(crate) fn is_valid_symbol(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => false,
        Some(first) => {
            if first.is_ascii_digit() {
                return false;
            }
            if first == '-' {
                if let Some(second) = chars.next() {
                    if second.is_ascii_digit() {
                        return false;
                    }
                }
            }
            name.chars()
                .all(|c| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c))
        }
    }
}

/// Controls optional reader behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseConfig {
    /// Strip `;` line comments before parsing.
    pub handle_comments: bool,
}

/// Parsed source, not yet lowered into the heap.
#[derive(Debug, Clone, PartialEq)]
enum Datum {
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Str(String),
    Symbol(String),
    List(Vec<Datum>),
    /// `(a b . c)` - a non-empty prefix and the improper tail.
    Improper(Vec<Datum>, Box<Datum>),
}

fn parse_decimal(input: &str) -> IResult<&str, Datum> {
    let (input, number_str) = recognize(pair(
        opt(char('-')),
        take_while1(|c: char| c.is_ascii_digit()),
    ))
    .parse(input)?;

    match number_str.parse::<i64>() {
        Ok(n) => Ok((input, Datum::Integer(n))),
        // Overflow or invalid format; symbol parsing rejects a digit start
        // anyway, so there is no fallback.
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Digit,
        ))),
    }
}

fn parse_hexadecimal(input: &str) -> IResult<&str, Datum> {
    let (input, _) = char('#').parse(input)?;
    let (input, _) = alt((char('x'), char('X'))).parse(input)?;
    let (input, hex_digits) = take_while1(|c: char| c.is_ascii_hexdigit()).parse(input)?;

    match i64::from_str_radix(hex_digits, 16) {
        Ok(n) => Ok((input, Datum::Integer(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::HexDigit,
        ))),
    }
}

fn parse_real(input: &str) -> IResult<&str, Datum> {
    let (input, number_str) =
        recognize(tuple((opt(char('-')), digit1, char('.'), digit1))).parse(input)?;

    match number_str.parse::<f64>() {
        Ok(n) => Ok((input, Datum::Real(n))),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Float,
        ))),
    }
}

fn parse_number(input: &str) -> IResult<&str, Datum> {
    alt((parse_hexadecimal, parse_real, parse_decimal)).parse(input)
}

fn parse_bool(input: &str) -> IResult<&str, Datum> {
    alt((
        value(Datum::Boolean(true), tag("#t")),
        value(Datum::Boolean(false), tag("#f")),
    ))
    .parse(input)
}

fn parse_symbol(input: &str) -> IResult<&str, Datum> {
    let mut symbol_chars =
        take_while1(|c: char| c.is_alphanumeric() || SYMBOL_SPECIAL_CHARS.contains(c));

    let (remaining, candidate) = symbol_chars.parse(input)?;

    if is_valid_symbol(candidate) {
        Ok((remaining, Datum::Symbol(candidate.to_string())))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::Alpha,
        )))
    }
}

fn parse_string(input: &str) -> IResult<&str, Datum> {
    let (mut remaining, _) = char('"').parse(input)?;
    let mut chars = Vec::new();

    loop {
        let mut char_iter = remaining.chars();
        match char_iter.next() {
            Some('"') => {
                return Ok((char_iter.as_str(), Datum::Str(chars.into_iter().collect())));
            }
            Some('\\') => {
                match char_iter.next() {
                    Some('n') => chars.push('\n'),
                    Some('t') => chars.push('\t'),
                    Some('r') => chars.push('\r'),
                    Some('\\') => chars.push('\\'),
                    Some('"') => chars.push('"'),
                    // Unknown or incomplete escape sequence.
                    _ => {
                        return Err(nom::Err::Error(nom::error::Error::new(
                            remaining,
                            ErrorKind::Char,
                        )));
                    }
                }
                remaining = char_iter.as_str();
            }
            Some(ch) => {
                chars.push(ch);
                remaining = char_iter.as_str();
            }
            // End of input without a closing quote.
            None => {
                return Err(nom::Err::Error(nom::error::Error::new(
                    remaining,
                    ErrorKind::Char,
                )));
            }
        }
    }
}

fn parse_list(input: &str, depth: usize) -> IResult<&str, Datum> {
    let (input, _) = char('(').parse(input)?;
    let (input, _) = multispace0.parse(input)?;

    let (input, elements) =
        separated_list0(multispace1, |input| parse_sexpr(input, depth + 1)).parse(input)?;

    // Improper tail: `(a b . c)`. The dot must be whitespace-delimited,
    // which keeps it distinct from symbols and reals.
    let (input, dotted_tail) = opt(preceded(
        tuple((multispace1, char('.'), multispace1)),
        |input| parse_sexpr(input, depth + 1),
    ))
    .parse(input)?;

    let (input, _) = multispace0.parse(input)?;
    let (input, _) = char(')').parse(input)?;

    match dotted_tail {
        Some(tail) => {
            if elements.is_empty() {
                // `( . x)` has no car.
                Err(nom::Err::Error(nom::error::Error::new(input, ErrorKind::Char)))
            } else {
                Ok((input, Datum::Improper(elements, Box::new(tail))))
            }
        }
        None => Ok((input, Datum::List(elements))),
    }
}

/// `'expr` -> `(quote expr)`.
fn parse_quote(input: &str, depth: usize) -> IResult<&str, Datum> {
    let (input, _) = char('\'').parse(input)?;
    let (input, expr) = parse_sexpr(input, depth + 1)?;
    Ok((
        input,
        Datum::List(vec![Datum::Symbol("quote".to_string()), expr]),
    ))
}

fn parse_sexpr(input: &str, depth: usize) -> IResult<&str, Datum> {
    if depth >= MAX_PARSE_DEPTH {
        // Failure, not Error: alt must not backtrack over this and mask it
        // with a less specific branch error.
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            ErrorKind::TooLarge,
        )));
    }
    preceded(
        multispace0,
        alt((
            |input| parse_quote(input, depth),
            |input| parse_list(input, depth),
            parse_number,
            parse_bool,
            parse_string,
            parse_symbol,
        )),
    )
    .parse(input)
}

/// Convert nom failures to structured parse errors.
fn convert_error(input: &str, error: nom::Err<nom::error::Error<&str>>) -> ParseError {
    match error {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let position = input.len().saturating_sub(e.input.len());
            match e.code {
                ErrorKind::TooLarge => ParseError::new(
                    ParseErrorKind::TooDeeplyNested,
                    format!("expression too deeply nested (max depth: {MAX_PARSE_DEPTH})"),
                ),
                _ if position >= input.trim_end().len() => ParseError::new(
                    ParseErrorKind::Incomplete,
                    "unexpected end of input",
                ),
                _ => ParseError::with_context(
                    ParseErrorKind::InvalidSyntax,
                    "invalid syntax",
                    input,
                    position,
                ),
            }
        }
        nom::Err::Incomplete(_) => {
            ParseError::new(ParseErrorKind::Incomplete, "incomplete input")
        }
    }
}

/// Unclosed parentheses or an unterminated string: the input is a prefix
/// of something well-formed, which drivers may treat as "keep reading".
fn looks_incomplete(source: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    let mut escaped = false;
    for ch in source.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    in_string || depth > 0
}

/// Convert a reader failure, upgrading generic syntax errors on
/// prefix-of-well-formed input to `Incomplete`.
fn reader_error(source: &str, error: nom::Err<nom::error::Error<&str>>) -> Error {
    let converted = convert_error(source, error);
    if converted.kind == ParseErrorKind::InvalidSyntax && looks_incomplete(source) {
        return Error::ParseError(ParseError::new(
            ParseErrorKind::Incomplete,
            "input ended before the expression was complete",
        ));
    }
    Error::ParseError(converted)
}

/// Strip `;` line comments, respecting string literals.
fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut in_comment = false;
    for ch in input.chars() {
        if in_comment {
            if ch == '\n' {
                in_comment = false;
                out.push(ch);
            }
            continue;
        }
        match ch {
            '"' if !escaped => in_string = !in_string,
            ';' if !in_string => {
                in_comment = true;
                continue;
            }
            _ => {}
        }
        escaped = in_string && ch == '\\' && !escaped;
        out.push(ch);
    }
    out
}

fn lower(heap: &mut Heap, datum: &Datum) -> Value {
    match datum {
        Datum::Integer(n) => Value::Integer(*n),
        Datum::Real(n) => Value::Real(*n),
        Datum::Boolean(b) => Value::Boolean(*b),
        Datum::Str(s) => Value::string(s),
        Datum::Symbol(name) => Value::Symbol(heap.intern(name)),
        Datum::List(items) => {
            let values: Vec<Value> = items.iter().map(|item| lower(heap, item)).collect();
            heap.list(&values)
        }
        Datum::Improper(items, tail) => {
            let mut result = lower(heap, tail);
            for item in items.iter().rev() {
                let car = lower(heap, item);
                result = heap.cons(car, result);
            }
            result
        }
    }
}

/// Parse exactly one datum from the input; trailing content is an error.
pub fn parse_datum(input: &str, heap: &mut Heap) -> Result<Value, Error> {
    parse_datum_with_config(input, ParseConfig::default(), heap)
}

pub fn parse_datum_with_config(
    input: &str,
    config: ParseConfig,
    heap: &mut Heap,
) -> Result<Value, Error> {
    let cleaned;
    let source = if config.handle_comments {
        cleaned = strip_comments(input);
        cleaned.as_str()
    } else {
        input
    };

    let result = match terminated(|input| parse_sexpr(input, 0), multispace0).parse(source) {
        Ok(("", datum)) => Ok(lower(heap, &datum)),
        Ok((remaining, _)) => Err(Error::ParseError(ParseError::new(
            ParseErrorKind::TrailingContent,
            format!("unexpected remaining input: '{remaining}'"),
        ))),
        Err(e) => Err(reader_error(source, e)),
    };
    result
}

/// Parse a whole program: zero or more data, in order.
pub fn parse_program(input: &str, heap: &mut Heap) -> Result<Vec<Value>, Error> {
    parse_program_with_config(input, ParseConfig::default(), heap)
}

pub fn parse_program_with_config(
    input: &str,
    config: ParseConfig,
    heap: &mut Heap,
) -> Result<Vec<Value>, Error> {
    let cleaned;
    let source = if config.handle_comments {
        cleaned = strip_comments(input);
        cleaned.as_str()
    } else {
        input
    };

    let mut values = Vec::new();
    let mut rest = source;
    loop {
        if rest.trim_start().is_empty() {
            return Ok(values);
        }
        match parse_sexpr(rest, 0) {
            Ok((remaining, datum)) => {
                values.push(lower(heap, &datum));
                rest = remaining;
            }
            Err(e) => return Err(reader_error(source, e)),
        }
    }
}
