//! The evaluator core: the mutually recursive `evaluate`/`apply` pair.
//!
//! `evaluate` is a dispatch loop over the form classifier. Tail positions
//! (the chosen branch of `if`, the last action of `begin`, and a compound
//! procedure's final body expression) are trampolined: instead of
//! recursing, the loop replaces its current expression (and, on
//! application, its environment) and continues. Deep tail recursion
//! therefore runs in constant Rust stack, which the heavy-allocation
//! workloads rely on. Everything else recurses and is bounded by
//! [`crate::MAX_EVAL_DEPTH`], the practical recursion limit.
//!
//! The evaluator has no state beyond the call stack; the only mutable
//! state anywhere is the environment chain and pair cells in the heap.
//! Errors abort the in-flight evaluation and propagate to the caller.

use crate::environment::Environment;
use crate::heap::Heap;
use crate::print;
use crate::syntax;
use crate::value::{Lambda, PrimitiveProc, Value};
use crate::{Error, MAX_EVAL_DEPTH};

/// Evaluate an expression in the given environment.
pub fn evaluate(heap: &mut Heap, env: Environment, expr: &Value) -> Result<Value, Error> {
    evaluate_with_depth(heap, env, expr.clone(), 0)
}

fn evaluate_with_depth(
    heap: &mut Heap,
    mut env: Environment,
    mut expr: Value,
    depth: usize,
) -> Result<Value, Error> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(Error::EvalError(format!(
            "recursion limit exceeded (max non-tail depth: {MAX_EVAL_DEPTH})"
        )));
    }

    // The loop trampolines tail calls: tail positions assign `expr` (and
    // `env`) and continue instead of recursing.
    loop {
        match &expr {
            Value::Integer(_) | Value::Real(_) | Value::Boolean(_) | Value::String(_) => {
                return Ok(expr);
            }

            Value::Symbol(sym) => return env.lookup(heap, *sym),

            Value::Pair(p) => {
                let p = *p;
                // Sym is Copy; lift the tag ids out so the borrow of the
                // heap's symbol table does not outlive this statement.
                let s = heap.specials();
                let (quote_s, set_s, define_s, if_s, lambda_s, begin_s) =
                    (s.quote, s.set_bang, s.define, s.if_, s.lambda, s.begin);
                let tag = match heap.car(p) {
                    Value::Symbol(head) => Some(head),
                    _ => None,
                };

                match tag {
                    Some(t) if t == quote_s => {
                        return syntax::quoted_datum(heap, &expr);
                    }

                    Some(t) if t == set_s => {
                        let (sym, value_expr) = syntax::assignment_parts(heap, &expr)?;
                        let value = evaluate_with_depth(heap, env, value_expr, depth + 1)?;
                        env.assign(heap, sym, value)?;
                        return Ok(heap.ok_symbol());
                    }

                    Some(t) if t == define_s => {
                        let (sym, value_expr) = syntax::definition_parts(heap, &expr)?;
                        let value = evaluate_with_depth(heap, env, value_expr, depth + 1)?;
                        env.define(heap, sym, value)?;
                        return Ok(heap.ok_symbol());
                    }

                    Some(t) if t == if_s => {
                        let (predicate, consequent, alternative) = syntax::if_parts(heap, &expr)?;
                        let test = evaluate_with_depth(heap, env, predicate, depth + 1)?;
                        if test.is_truthy() {
                            expr = consequent;
                        } else {
                            match alternative {
                                Some(alternative) => expr = alternative,
                                None => return Ok(Value::Boolean(false)),
                            }
                        }
                    }

                    Some(t) if t == lambda_s => {
                        let (params, body) = syntax::lambda_parts(heap, &expr)?;
                        let lambda = heap.allocate_lambda(Lambda {
                            params,
                            body,
                            // The *current* environment is captured; nothing
                            // in the body is evaluated yet.
                            env,
                        });
                        return Ok(Value::Compound(lambda));
                    }

                    Some(t) if t == begin_s => {
                        let actions = syntax::begin_actions(heap, &expr)?;
                        expr = evaluate_leading(heap, env, &actions, depth)?;
                    }

                    _ => {
                        let (operator_expr, operand_exprs) =
                            syntax::application_parts(heap, &expr)?;
                        let operator = evaluate_with_depth(heap, env, operator_expr, depth + 1)?;
                        let args = evaluate_operands(heap, env, &operand_exprs, depth)?;

                        match operator {
                            Value::Primitive(prim) => {
                                return call_primitive(heap, &prim, &args);
                            }
                            Value::Compound(l) => {
                                let Lambda {
                                    params,
                                    body,
                                    env: captured,
                                } = heap.lambda(l).clone();
                                env = Environment::extend(heap, &params, args, captured)?;
                                expr = evaluate_leading(heap, env, &body, depth)?;
                            }
                            other => {
                                return Err(Error::NotAProcedure(print::to_string(heap, &other)));
                            }
                        }
                    }
                }
            }

            other => return Err(Error::SyntaxError(print::to_string(heap, other))),
        }
    }
}

/// Apply a procedure value to already-evaluated arguments.
pub fn apply(heap: &mut Heap, procedure: &Value, args: Vec<Value>) -> Result<Value, Error> {
    match procedure {
        Value::Primitive(prim) => call_primitive(heap, prim, &args),
        Value::Compound(l) => {
            let Lambda {
                params,
                body,
                env: captured,
            } = heap.lambda(*l).clone();
            let env = Environment::extend(heap, &params, args, captured)?;
            let tail = evaluate_leading(heap, env, &body, 0)?;
            evaluate_with_depth(heap, env, tail, 0)
        }
        other => Err(Error::NotAProcedure(print::to_string(heap, other))),
    }
}

fn call_primitive(heap: &mut Heap, prim: &PrimitiveProc, args: &[Value]) -> Result<Value, Error> {
    (prim.func)(heap, args).map_err(|message| Error::PrimitiveError {
        name: prim.name.to_string(),
        message,
    })
}

/// Evaluate every expression of a sequence except the last, and hand the
/// last one back so the caller can trampoline it.
fn evaluate_leading(
    heap: &mut Heap,
    env: Environment,
    actions: &Value,
    depth: usize,
) -> Result<Value, Error> {
    let mut rest = actions.clone();
    loop {
        match rest {
            Value::Pair(p) => {
                let action = heap.car(p);
                match heap.cdr(p) {
                    Value::EmptyList => return Ok(action),
                    tail => {
                        evaluate_with_depth(heap, env, action, depth + 1)?;
                        rest = tail;
                    }
                }
            }
            _ => return Err(Error::SyntaxError(print::to_string(heap, actions))),
        }
    }
}

/// Evaluate operand expressions strictly left to right, producing the
/// argument values in order.
fn evaluate_operands(
    heap: &mut Heap,
    env: Environment,
    operands: &Value,
    depth: usize,
) -> Result<Vec<Value>, Error> {
    let mut args = Vec::new();
    let mut rest = operands.clone();
    while let Value::Pair(p) = rest {
        let operand = heap.car(p);
        args.push(evaluate_with_depth(heap, env, operand, depth + 1)?);
        rest = heap.cdr(p);
    }
    Ok(args)
}
