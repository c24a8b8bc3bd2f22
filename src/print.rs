//! Printing values' text representations.
//!
//! Rendering needs the heap (to resolve interned symbols and follow pair
//! references), so `Value` cannot implement `fmt::Display` on its own;
//! [`Displayed`] couples a value with its heap for use in format strings,
//! and [`to_string`] is the one-shot convenience.
//!
//! Compound procedures render as
//! `(compound-procedure params body <procedure-env>)` without dumping the
//! captured environment. Nesting beyond [`crate::MAX_PRINT_DEPTH`] and
//! lists longer than an internal cap are elided with `...`, so circular
//! structure built through `set-car!`/`set-cdr!` cannot hang the printer.

use std::fmt;

use crate::heap::{Heap, PairRef};
use crate::value::Value;
use crate::MAX_PRINT_DEPTH;

/// Elements printed along one cdr chain before eliding the rest.
const MAX_PRINT_LENGTH: usize = 4096;

/// A value paired with its heap, for use with `{}`.
pub struct Displayed<'a> {
    heap: &'a Heap,
    value: &'a Value,
}

impl<'a> Displayed<'a> {
    pub fn new(heap: &'a Heap, value: &'a Value) -> Displayed<'a> {
        Displayed { heap, value }
    }
}

impl fmt::Display for Displayed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write_value(f, self.heap, self.value, 0)
    }
}

/// Render a value in external syntax.
pub fn to_string(heap: &Heap, value: &Value) -> String {
    format!("{}", Displayed::new(heap, value))
}

fn write_value(f: &mut fmt::Formatter, heap: &Heap, value: &Value, depth: usize) -> fmt::Result {
    if depth >= MAX_PRINT_DEPTH {
        return write!(f, "...");
    }
    match value {
        Value::Integer(n) => write!(f, "{n}"),
        // Debug formatting keeps the decimal point so reals re-read as reals.
        Value::Real(n) => write!(f, "{n:?}"),
        Value::Boolean(b) => write!(f, "{}", if *b { "#t" } else { "#f" }),
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
        Value::Symbol(sym) => write!(f, "{}", heap.symbol_name(*sym)),
        Value::EmptyList => write!(f, "()"),
        Value::Pair(p) => {
            write!(f, "(")?;
            write_pair(f, heap, *p, depth)?;
            write!(f, ")")
        }
        Value::Compound(l) => {
            let lambda = heap.lambda(*l);
            write!(f, "(compound-procedure (")?;
            for (i, param) in lambda.params.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", heap.symbol_name(*param))?;
            }
            write!(f, ") ")?;
            write_value(f, heap, &lambda.body, depth + 1)?;
            write!(f, " <procedure-env>)")
        }
        Value::Primitive(p) => write!(f, "#<primitive:{}>", p.name),
    }
}

/// Print a cdr chain without the containing parentheses. The chain is
/// walked iteratively so long lists do not recurse; only the elements do.
fn write_pair(f: &mut fmt::Formatter, heap: &Heap, pair: PairRef, depth: usize) -> fmt::Result {
    let mut current = pair;
    let mut printed = 0;
    loop {
        if printed >= MAX_PRINT_LENGTH {
            return write!(f, "...");
        }
        if printed > 0 {
            write!(f, " ")?;
        }
        let car = heap.car(current);
        write_value(f, heap, &car, depth + 1)?;
        printed += 1;

        match heap.cdr(current) {
            Value::EmptyList => return Ok(()),
            Value::Pair(next) => current = next,
            tail => {
                write!(f, " . ")?;
                return write_value(f, heap, &tail, depth + 1);
            }
        }
    }
}
