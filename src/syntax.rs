//! Classifying values viewed as source code.
//!
//! The language is homoiconic: an expression is just a [`Value`] tree. A
//! pair whose first element is one of the special-form tags (`quote`,
//! `set!`, `define`, `if`, `lambda`, `begin`) is that form; any other pair
//! is a procedure application; an atom is a literal or a variable
//! reference.
//!
//! Each predicate here is pure inspection; the matching projector
//! validates the form's shape and extracts its parts, raising a syntax
//! error carrying the rendered offending expression otherwise. The
//! projectors are the only place form shapes are encoded, so the evaluator
//! stays a plain dispatch loop.

use crate::heap::{Heap, PairRef, Sym};
use crate::print;
use crate::value::Value;
use crate::Error;

fn syntax_error(heap: &Heap, expr: &Value) -> Error {
    Error::SyntaxError(print::to_string(heap, expr))
}

/// The pair behind `expr` when it is a pair tagged with `tag`.
fn as_tagged(heap: &Heap, expr: &Value, tag: Sym) -> Option<PairRef> {
    match expr {
        Value::Pair(p) => match heap.car(*p) {
            Value::Symbol(head) if head == tag => Some(*p),
            _ => None,
        },
        _ => None,
    }
}

/// Numbers, strings, and booleans evaluate to themselves.
pub fn is_self_evaluating(expr: &Value) -> bool {
    expr.is_self_evaluating()
}

/// A bare symbol is a variable reference.
pub fn is_variable(expr: &Value) -> bool {
    matches!(expr, Value::Symbol(_))
}

pub fn is_quoted(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().quote).is_some()
}

pub fn is_assignment(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().set_bang).is_some()
}

pub fn is_definition(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().define).is_some()
}

pub fn is_if(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().if_).is_some()
}

pub fn is_lambda(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().lambda).is_some()
}

pub fn is_begin(heap: &Heap, expr: &Value) -> bool {
    as_tagged(heap, expr, heap.specials().begin).is_some()
}

/// Any pair form not claimed by a special-form tag is an application.
pub fn is_application(heap: &Heap, expr: &Value) -> bool {
    match expr {
        Value::Pair(p) => {
            if let Value::Symbol(head) = heap.car(*p) {
                let s = heap.specials();
                head != s.quote
                    && head != s.set_bang
                    && head != s.define
                    && head != s.if_
                    && head != s.lambda
                    && head != s.begin
            } else {
                true
            }
        }
        _ => false,
    }
}

/// `(quote datum)` -> the datum, unevaluated.
pub fn quoted_datum(heap: &Heap, expr: &Value) -> Result<Value, Error> {
    match heap.list_items(expr).as_deref() {
        Some([_, datum]) => Ok(datum.clone()),
        _ => Err(syntax_error(heap, expr)),
    }
}

/// `(set! sym value-expr)` -> the symbol and the unevaluated value
/// expression.
pub fn assignment_parts(heap: &Heap, expr: &Value) -> Result<(Sym, Value), Error> {
    match heap.list_items(expr).as_deref() {
        Some([_, Value::Symbol(sym), value_expr]) => Ok((*sym, value_expr.clone())),
        _ => Err(syntax_error(heap, expr)),
    }
}

/// A definition's name and unevaluated value expression.
///
/// Two shapes are accepted: `(define name value-expr)`, and the procedure
/// sugar `(define (name . formals) body...)`, for which this synthesizes
/// `(lambda formals body...)` as the value expression.
pub fn definition_parts(heap: &mut Heap, expr: &Value) -> Result<(Sym, Value), Error> {
    let p0 = match expr {
        Value::Pair(p) => *p,
        _ => return Err(syntax_error(heap, expr)),
    };
    let p1 = match heap.cdr(p0) {
        Value::Pair(p) => p,
        _ => return Err(syntax_error(heap, expr)),
    };
    match heap.car(p1) {
        // (define name value-expr)
        Value::Symbol(name) => match heap.list_items(expr).as_deref() {
            Some([_, _, value_expr]) => Ok((name, value_expr.clone())),
            _ => Err(syntax_error(heap, expr)),
        },
        // (define (name . formals) body...)
        Value::Pair(header) => {
            let name = match heap.car(header) {
                Value::Symbol(name) => name,
                _ => return Err(syntax_error(heap, expr)),
            };
            let formals = heap.cdr(header);
            let body = heap.cdr(p1);
            if !body.is_pair() {
                return Err(syntax_error(heap, expr));
            }
            let lambda_tag = Value::Symbol(heap.specials().lambda);
            let tail = heap.cons(formals, body);
            let lambda_form = heap.cons(lambda_tag, tail);
            Ok((name, lambda_form))
        }
        _ => Err(syntax_error(heap, expr)),
    }
}

/// `(if predicate consequent alternative?)` -> the three parts; the
/// alternative is optional.
pub fn if_parts(heap: &Heap, expr: &Value) -> Result<(Value, Value, Option<Value>), Error> {
    match heap.list_items(expr).as_deref() {
        Some([_, predicate, consequent]) => Ok((predicate.clone(), consequent.clone(), None)),
        Some([_, predicate, consequent, alternative]) => Ok((
            predicate.clone(),
            consequent.clone(),
            Some(alternative.clone()),
        )),
        _ => Err(syntax_error(heap, expr)),
    }
}

/// `(lambda formals body...)` -> the validated parameter symbols and the
/// body sequence (still in source form).
///
/// Formals must be a proper list of distinct symbols; the body must be a
/// non-empty proper list of expressions.
pub fn lambda_parts(heap: &Heap, expr: &Value) -> Result<(Vec<Sym>, Value), Error> {
    let p0 = match expr {
        Value::Pair(p) => *p,
        _ => return Err(syntax_error(heap, expr)),
    };
    let p1 = match heap.cdr(p0) {
        Value::Pair(p) => p,
        _ => return Err(syntax_error(heap, expr)),
    };
    let formals = heap.car(p1);
    let body = heap.cdr(p1);

    let formal_items = heap
        .list_items(&formals)
        .ok_or_else(|| syntax_error(heap, expr))?;
    let mut params = Vec::with_capacity(formal_items.len());
    for formal in formal_items {
        match formal {
            Value::Symbol(sym) => {
                if params.contains(&sym) {
                    return Err(Error::EvalError(format!(
                        "duplicate parameter name: {}",
                        heap.symbol_name(sym)
                    )));
                }
                params.push(sym);
            }
            _ => return Err(syntax_error(heap, expr)),
        }
    }

    match heap.list_len(&body) {
        Some(n) if n > 0 => Ok((params, body)),
        _ => Err(syntax_error(heap, expr)),
    }
}

/// `(begin action...)` -> the non-empty action sequence.
pub fn begin_actions(heap: &Heap, expr: &Value) -> Result<Value, Error> {
    let p0 = match expr {
        Value::Pair(p) => *p,
        _ => return Err(syntax_error(heap, expr)),
    };
    let actions = heap.cdr(p0);
    match heap.list_len(&actions) {
        // An empty sequence is ill-formed.
        Some(n) if n > 0 => Ok(actions),
        _ => Err(syntax_error(heap, expr)),
    }
}

/// `(operator operand...)` -> the operator expression and the operand
/// list. The form must be a proper list.
pub fn application_parts(heap: &Heap, expr: &Value) -> Result<(Value, Value), Error> {
    match expr {
        Value::Pair(p) => {
            let operands = heap.cdr(*p);
            if heap.list_len(&operands).is_none() {
                return Err(syntax_error(heap, expr));
            }
            Ok((heap.car(*p), operands))
        }
        _ => Err(syntax_error(heap, expr)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(heap: &mut Heap, tag: &str, rest: &[Value]) -> Value {
        let tag = Value::Symbol(heap.intern(tag));
        let mut items = vec![tag];
        items.extend_from_slice(rest);
        heap.list(&items)
    }

    #[test]
    fn classifies_atoms() {
        let mut heap = Heap::new();
        let sym = Value::Symbol(heap.intern("x"));

        assert!(is_self_evaluating(&Value::Integer(1)));
        assert!(is_self_evaluating(&Value::string("s")));
        assert!(is_self_evaluating(&Value::Boolean(false)));
        assert!(!is_self_evaluating(&sym));
        assert!(!is_self_evaluating(&Value::EmptyList));
        assert!(is_variable(&sym));
        assert!(!is_variable(&Value::Integer(1)));
    }

    #[test]
    fn classifies_special_forms_by_leading_tag() {
        let mut heap = Heap::new();
        let x = Value::Symbol(heap.intern("x"));
        let quoted = form(&mut heap, "quote", &[x.clone()]);
        let set = form(&mut heap, "set!", &[x.clone(), Value::Integer(1)]);
        let defined = form(&mut heap, "define", &[x.clone(), Value::Integer(1)]);
        let call = form(&mut heap, "f", &[Value::Integer(1)]);

        assert!(is_quoted(&heap, &quoted));
        assert!(is_assignment(&heap, &set));
        assert!(is_definition(&heap, &defined));
        assert!(!is_application(&heap, &quoted));
        assert!(is_application(&heap, &call));
        assert!(!is_application(&heap, &x));
    }

    #[test]
    fn quoted_datum_returns_datum_unevaluated() {
        let mut heap = Heap::new();
        let datum = heap.list(&[Value::Integer(1), Value::Integer(2)]);
        let quoted = form(&mut heap, "quote", &[datum.clone()]);
        assert_eq!(quoted_datum(&heap, &quoted).unwrap(), datum);

        // Wrong number of parts in the quoted form.
        let bad = form(&mut heap, "quote", &[]);
        assert!(matches!(
            quoted_datum(&heap, &bad),
            Err(Error::SyntaxError(_))
        ));
    }

    #[test]
    fn if_alternative_is_optional() {
        let mut heap = Heap::new();
        let with = form(
            &mut heap,
            "if",
            &[Value::Boolean(true), Value::Integer(1), Value::Integer(2)],
        );
        let without = form(&mut heap, "if", &[Value::Boolean(true), Value::Integer(1)]);

        let (_, _, alt) = if_parts(&heap, &with).unwrap();
        assert_eq!(alt, Some(Value::Integer(2)));
        let (_, _, alt) = if_parts(&heap, &without).unwrap();
        assert_eq!(alt, None);

        let bad = form(&mut heap, "if", &[Value::Boolean(true)]);
        assert!(if_parts(&heap, &bad).is_err());
    }

    #[test]
    fn sugared_define_synthesizes_a_lambda() {
        let mut heap = Heap::new();
        // (define (twice x) (+ x x))
        let x = Value::Symbol(heap.intern("x"));
        let name = Value::Symbol(heap.intern("twice"));
        let header = heap.list(&[name, x.clone()]);
        let plus = Value::Symbol(heap.intern("+"));
        let body_expr = heap.list(&[plus, x.clone(), x.clone()]);
        let define = form(&mut heap, "define", &[header, body_expr.clone()]);

        let (sym, value_expr) = definition_parts(&mut heap, &define).unwrap();
        assert_eq!(heap.symbol_name(sym), "twice");
        assert!(is_lambda(&heap, &value_expr));

        let (params, body) = lambda_parts(&heap, &value_expr).unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(heap.symbol_name(params[0]), "x");
        assert_eq!(heap.list_items(&body).unwrap(), vec![body_expr]);
    }

    #[test]
    fn lambda_rejects_bad_formals_and_empty_body() {
        let mut heap = Heap::new();
        let x = Value::Symbol(heap.intern("x"));

        let formals = heap.list(&[x.clone(), x.clone()]);
        let dup = form(&mut heap, "lambda", &[formals, Value::Integer(1)]);
        assert!(matches!(
            lambda_parts(&heap, &dup),
            Err(Error::EvalError(_))
        ));

        let formals = heap.list(&[x.clone()]);
        let empty_body = form(&mut heap, "lambda", &[formals]);
        assert!(lambda_parts(&heap, &empty_body).is_err());

        let non_symbol = heap.list(&[Value::Integer(1)]);
        let bad = form(&mut heap, "lambda", &[non_symbol, Value::Integer(1)]);
        assert!(lambda_parts(&heap, &bad).is_err());
    }

    #[test]
    fn begin_requires_a_nonempty_sequence() {
        let mut heap = Heap::new();
        let good = form(&mut heap, "begin", &[Value::Integer(1), Value::Integer(2)]);
        let actions = begin_actions(&heap, &good).unwrap();
        assert_eq!(heap.list_len(&actions), Some(2));

        let empty = form(&mut heap, "begin", &[]);
        assert!(begin_actions(&heap, &empty).is_err());
    }

    #[test]
    fn application_requires_a_proper_list() {
        let mut heap = Heap::new();
        let f = Value::Symbol(heap.intern("f"));
        let good = heap.list(&[f.clone(), Value::Integer(1)]);
        let (operator, operands) = application_parts(&heap, &good).unwrap();
        assert_eq!(operator, f);
        assert_eq!(heap.list_len(&operands), Some(1));

        let improper = heap.cons(f, Value::Integer(1));
        assert!(application_parts(&heap, &improper).is_err());
    }
}
