//! The default primitive table and global environment setup.
//!
//! A primitive is an opaque host operation: it receives the
//! already-evaluated argument values and either returns a value or signals
//! failure with a message (surfaced by the evaluator as a primitive
//! error). [`setup_environment`] wraps each `(name, operation)` entry of a
//! host-supplied table in a procedure value and binds it in a single fresh
//! frame, together with `true` and `false`; [`make_global_environment`]
//! does so with the default table below.
//!
//! Arithmetic uses checked 64-bit integer operations (overflow is an
//! error, not a wrap) and promotes to `f64` when any operand is real.

use crate::environment::Environment;
use crate::evaluator;
use crate::heap::Heap;
use crate::print;
use crate::value::{PrimitiveFn, PrimitiveProc, Value};

/// The default primitive table, in binding order.
pub fn default_primitives() -> Vec<(&'static str, PrimitiveFn)> {
    vec![
        ("cons", cons),
        ("car", car),
        ("cdr", cdr),
        ("set-car!", set_car_bang),
        ("set-cdr!", set_cdr_bang),
        ("list", list),
        ("length", length),
        ("apply", apply),
        ("null?", null_question),
        ("pair?", pair_question),
        ("atom?", atom_question),
        ("symbol?", symbol_question),
        ("number?", number_question),
        ("string?", string_question),
        ("not", not),
        ("eq?", eq_question),
        ("=", number_equal),
        ("<", less_than),
        (">", greater_than),
        ("+", add),
        ("-", subtract),
        ("*", multiply),
        ("/", divide),
        ("error", error),
        ("print", print_values),
    ]
}

/// Bind every entry of a host-supplied primitive table, plus `true` and
/// `false`, in a single fresh frame on top of the empty environment.
pub fn setup_environment(heap: &mut Heap, table: &[(&'static str, PrimitiveFn)]) -> Environment {
    let env = Environment::new_frame(heap, Environment::empty());
    for &(name, func) in table {
        let sym = heap.intern(name);
        let value = Value::Primitive(PrimitiveProc { name, func });
        env.define(heap, sym, value)
            .expect("fresh frame accepts definitions");
    }
    for (name, value) in [("true", Value::Boolean(true)), ("false", Value::Boolean(false))] {
        let sym = heap.intern(name);
        env.define(heap, sym, value)
            .expect("fresh frame accepts definitions");
    }
    env
}

/// A global environment seeded with the default primitive table.
pub fn make_global_environment(heap: &mut Heap) -> Environment {
    setup_environment(heap, &default_primitives())
}

// ----- numeric helpers -----

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Real(f64),
}

impl Num {
    fn as_real(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Real(n) => n,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Num::Int(n) => Value::Integer(n),
            Num::Real(n) => Value::Real(n),
        }
    }
}

fn as_num(heap: &Heap, name: &str, value: &Value) -> Result<Num, String> {
    match value {
        Value::Integer(n) => Ok(Num::Int(*n)),
        Value::Real(n) => Ok(Num::Real(*n)),
        other => Err(format!(
            "cannot use `{name}` with non-number: {}",
            print::to_string(heap, other)
        )),
    }
}

fn fold_numeric(
    heap: &Heap,
    name: &'static str,
    args: &[Value],
    init: Num,
    int_op: fn(i64, i64) -> Option<i64>,
    real_op: fn(f64, f64) -> f64,
) -> Result<Num, String> {
    let mut acc = init;
    for arg in args {
        let num = as_num(heap, name, arg)?;
        acc = match (acc, num) {
            (Num::Int(a), Num::Int(b)) => {
                Num::Int(int_op(a, b).ok_or_else(|| format!("integer overflow in `{name}`"))?)
            }
            (a, b) => Num::Real(real_op(a.as_real(), b.as_real())),
        };
    }
    Ok(acc)
}

fn add(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    fold_numeric(heap, "+", args, Num::Int(0), i64::checked_add, |a, b| a + b)
        .map(Num::into_value)
}

fn multiply(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    fold_numeric(heap, "*", args, Num::Int(1), i64::checked_mul, |a, b| a * b)
        .map(Num::into_value)
}

fn subtract(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [] => Err("`-` expects at least 1 argument, got 0".to_string()),
        // Unary minus negates.
        [only] => match as_num(heap, "-", only)? {
            Num::Int(n) => n
                .checked_neg()
                .map(Value::Integer)
                .ok_or_else(|| "integer overflow in `-`".to_string()),
            Num::Real(n) => Ok(Value::Real(-n)),
        },
        [first, rest @ ..] => {
            let first = as_num(heap, "-", first)?;
            fold_numeric(heap, "-", rest, first, i64::checked_sub, |a, b| a - b)
                .map(Num::into_value)
        }
    }
}

fn divide(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    if args.len() < 2 {
        return Err(format!("`/` expects at least 2 arguments, got {}", args.len()));
    }
    let mut acc = as_num(heap, "/", &args[0])?;
    for arg in &args[1..] {
        let num = as_num(heap, "/", arg)?;
        acc = match (acc, num) {
            (Num::Int(_), Num::Int(0)) => return Err("division by zero".to_string()),
            (Num::Int(a), Num::Int(b)) => Num::Int(
                a.checked_div(b)
                    .ok_or_else(|| "integer overflow in `/`".to_string())?,
            ),
            (a, b) => Num::Real(a.as_real() / b.as_real()),
        };
    }
    Ok(acc.into_value())
}

fn compare_chain(
    heap: &Heap,
    name: &'static str,
    args: &[Value],
    holds: fn(f64, f64) -> bool,
    holds_int: fn(i64, i64) -> bool,
) -> Result<Value, String> {
    if args.len() < 2 {
        return Err(format!(
            "`{name}` expects at least 2 arguments, got {}",
            args.len()
        ));
    }
    for window in args.windows(2) {
        let a = as_num(heap, name, &window[0])?;
        let b = as_num(heap, name, &window[1])?;
        let ok = match (a, b) {
            (Num::Int(a), Num::Int(b)) => holds_int(a, b),
            (a, b) => holds(a.as_real(), b.as_real()),
        };
        if !ok {
            return Ok(Value::Boolean(false));
        }
    }
    Ok(Value::Boolean(true))
}

fn number_equal(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    compare_chain(heap, "=", args, |a, b| a == b, |a, b| a == b)
}

fn less_than(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    compare_chain(heap, "<", args, |a, b| a < b, |a, b| a < b)
}

fn greater_than(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    compare_chain(heap, ">", args, |a, b| a > b, |a, b| a > b)
}

// ----- pairs and lists -----

fn cons(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [car, cdr] => Ok(heap.cons(car.clone(), cdr.clone())),
        _ => Err(format!("`cons` expects 2 arguments, got {}", args.len())),
    }
}

fn car(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Pair(p)] => Ok(heap.car(*p)),
        [other] => Err(format!(
            "cannot take car of non-pair: {}",
            print::to_string(heap, other)
        )),
        _ => Err(format!("`car` expects 1 argument, got {}", args.len())),
    }
}

fn cdr(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Pair(p)] => Ok(heap.cdr(*p)),
        [other] => Err(format!(
            "cannot take cdr of non-pair: {}",
            print::to_string(heap, other)
        )),
        _ => Err(format!("`cdr` expects 1 argument, got {}", args.len())),
    }
}

fn set_car_bang(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Pair(p), value] => {
            heap.set_car(*p, value.clone());
            Ok(heap.ok_symbol())
        }
        [other, _] => Err(format!(
            "cannot set-car! on non-pair: {}",
            print::to_string(heap, other)
        )),
        _ => Err(format!("`set-car!` expects 2 arguments, got {}", args.len())),
    }
}

fn set_cdr_bang(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [Value::Pair(p), value] => {
            heap.set_cdr(*p, value.clone());
            Ok(heap.ok_symbol())
        }
        [other, _] => Err(format!(
            "cannot set-cdr! on non-pair: {}",
            print::to_string(heap, other)
        )),
        _ => Err(format!("`set-cdr!` expects 2 arguments, got {}", args.len())),
    }
}

fn list(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    Ok(heap.list(args))
}

fn length(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [arg] => heap
            .list_len(arg)
            .map(|n| Value::Integer(n as i64))
            .ok_or_else(|| {
                format!(
                    "can only take length of proper lists, got {}",
                    print::to_string(heap, arg)
                )
            }),
        _ => Err(format!("`length` expects 1 argument, got {}", args.len())),
    }
}

fn apply(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [procedure, arg_list] => {
            let values = heap
                .list_items(arg_list)
                .ok_or_else(|| "must pass a proper list to `apply`".to_string())?;
            evaluator::apply(heap, procedure, values).map_err(|e| e.to_string())
        }
        _ => Err(format!("`apply` expects 2 arguments, got {}", args.len())),
    }
}

// ----- predicates -----

fn unary_predicate(
    name: &'static str,
    args: &[Value],
    test: impl Fn(&Value) -> bool,
) -> Result<Value, String> {
    match args {
        [arg] => Ok(Value::Boolean(test(arg))),
        _ => Err(format!("`{name}` expects 1 argument, got {}", args.len())),
    }
}

fn null_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("null?", args, Value::is_empty_list)
}

fn pair_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("pair?", args, Value::is_pair)
}

fn atom_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("atom?", args, |v| !v.is_pair())
}

fn symbol_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("symbol?", args, |v| matches!(v, Value::Symbol(_)))
}

fn number_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("number?", args, |v| {
        matches!(v, Value::Integer(_) | Value::Real(_))
    })
}

fn string_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("string?", args, |v| matches!(v, Value::String(_)))
}

fn not(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    unary_predicate("not", args, |v| !v.is_truthy())
}

fn eq_question(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
    match args {
        [a, b] => Ok(Value::Boolean(a == b)),
        _ => Err(format!("`eq?` expects 2 arguments, got {}", args.len())),
    }
}

// ----- host escape hatches -----

fn error(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    let mut message = String::from("user error");
    for arg in args {
        message.push_str("\n\t");
        message.push_str(&print::to_string(heap, arg));
    }
    Err(message)
}

fn print_values(heap: &mut Heap, args: &[Value]) -> Result<Value, String> {
    for arg in args {
        println!("{}", print::to_string(heap, arg));
    }
    Ok(heap.ok_symbol())
}
