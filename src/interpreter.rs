//! A convenience facade bundling a heap with a global environment.
//!
//! The evaluator core takes the heap and environment explicitly and never
//! hides them in globals; independent [`Interpreter`] instances are fully
//! isolated. This type exists for drivers (the REPL, program runners,
//! tests) that want the common pairing plus a garbage collection policy:
//! collection runs between top-level evaluations, when the only live roots
//! are the global environment and whatever values the driver still holds,
//! so nothing inside an evaluation ever needs rooting.

use crate::builtins::{make_global_environment, setup_environment};
use crate::environment::Environment;
use crate::evaluator::evaluate;
use crate::heap::Heap;
use crate::print;
use crate::value::{PrimitiveFn, Value};
use crate::Error;

#[cfg(feature = "scheme")]
use crate::scheme::{parse_program_with_config, ParseConfig};

/// Live-object count above which a collection is attempted after an
/// evaluation finishes.
const INITIAL_GC_THRESHOLD: usize = 4096;

/// An interpreter instance: a heap, its global environment, and a
/// collection threshold.
pub struct Interpreter {
    heap: Heap,
    global: Environment,
    gc_threshold: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter whose global environment carries the default
    /// primitive table.
    pub fn new() -> Interpreter {
        let mut heap = Heap::new();
        let global = make_global_environment(&mut heap);
        Interpreter {
            heap,
            global,
            gc_threshold: INITIAL_GC_THRESHOLD,
        }
    }

    /// An interpreter seeded with a custom primitive table instead.
    pub fn with_primitives(table: &[(&'static str, PrimitiveFn)]) -> Interpreter {
        let mut heap = Heap::new();
        let global = setup_environment(&mut heap, table);
        Interpreter {
            heap,
            global,
            gc_threshold: INITIAL_GC_THRESHOLD,
        }
    }

    pub fn heap(&self) -> &Heap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn global_environment(&self) -> Environment {
        self.global
    }

    /// Evaluate one already-parsed expression in the global environment.
    /// Does not collect; the caller may be holding unrooted values.
    pub fn eval_value(&mut self, expr: &Value) -> Result<Value, Error> {
        evaluate(&mut self.heap, self.global, expr)
    }

    /// Render a value in external syntax.
    pub fn render(&self, value: &Value) -> String {
        print::to_string(&self.heap, value)
    }

    /// Collect garbage now. `extra_roots` are the values the caller
    /// intends to keep using besides the global environment.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) {
        self.heap.collect_garbage(&[self.global], extra_roots);
    }

    /// Collect if the heap has grown past the threshold, then raise the
    /// threshold to twice the surviving population.
    fn maybe_collect(&mut self, extra_roots: &[Value]) {
        if self.heap.stats().total() > self.gc_threshold {
            self.collect_garbage(extra_roots);
            self.gc_threshold = INITIAL_GC_THRESHOLD.max(self.heap.stats().total() * 2);
        }
    }

    /// Parse and evaluate a single expression, collecting afterwards if
    /// the heap has grown enough.
    #[cfg(feature = "scheme")]
    pub fn eval_str(&mut self, input: &str) -> Result<Value, Error> {
        let config = ParseConfig {
            handle_comments: true,
        };
        let forms = parse_program_with_config(input, config, &mut self.heap)?;
        let mut result = Value::EmptyList;
        for (i, form) in forms.iter().enumerate() {
            result = self.eval_value(form)?;
            // Forms not yet evaluated must survive a collection.
            let mut roots = forms[i + 1..].to_vec();
            roots.push(result.clone());
            self.maybe_collect(&roots);
        }
        Ok(result)
    }

    /// Parse and evaluate a whole program, returning the last form's
    /// value (or `()` for an empty program).
    #[cfg(feature = "scheme")]
    pub fn run_program(&mut self, source: &str) -> Result<Value, Error> {
        self.eval_str(source)
    }
}

#[cfg(all(test, feature = "scheme"))]
mod tests {
    use super::*;

    #[test]
    fn eval_str_runs_a_session() {
        let mut interp = Interpreter::new();
        interp.eval_str("(define (square x) (* x x))").unwrap();
        assert_eq!(interp.eval_str("(square 7)").unwrap(), Value::Integer(49));
    }

    #[test]
    fn run_program_returns_the_last_value() {
        let mut interp = Interpreter::new();
        let result = interp
            .run_program("(define x 2) ; a comment\n(define y 3)\n(* x y)")
            .unwrap();
        assert_eq!(result, Value::Integer(6));
        assert_eq!(interp.run_program("").unwrap(), Value::EmptyList);
    }

    #[test]
    fn instances_are_independent() {
        let mut a = Interpreter::new();
        let mut b = Interpreter::new();
        a.eval_str("(define x 1)").unwrap();
        assert!(matches!(
            b.eval_str("x").unwrap_err(),
            Error::UnboundVariable(_)
        ));
    }

    #[test]
    fn collection_keeps_global_reachable_data() {
        let mut interp = Interpreter::new();
        interp.eval_str("(define xs (list 1 2 3))").unwrap();
        interp.collect_garbage(&[]);
        assert_eq!(interp.eval_str("(length xs)").unwrap(), Value::Integer(3));
    }

    #[test]
    fn collection_reclaims_rebound_structure() {
        let mut interp = Interpreter::new();
        interp
            .eval_str(
                "(define (iota n xs) (if (eq? n 0) xs (iota (- n 1) (cons n xs))))
                 (define big (iota 1000 '()))",
            )
            .unwrap();
        let populated = interp.heap().stats().live_pairs;
        assert!(populated >= 1000);

        // Dropping the only reference makes the whole chain collectable.
        interp.eval_str("(set! big '())").unwrap();
        interp.collect_garbage(&[]);
        assert!(interp.heap().stats().live_pairs < 100);
    }

    #[test]
    fn custom_primitive_tables() {
        fn shout(_: &mut Heap, args: &[Value]) -> Result<Value, String> {
            match args {
                [Value::String(s)] => Ok(Value::string(&s.to_uppercase())),
                _ => Err("expects one string".to_string()),
            }
        }

        let table: Vec<(&'static str, PrimitiveFn)> = vec![("shout", shout)];
        let mut interp = Interpreter::with_primitives(&table);
        assert_eq!(
            interp.eval_str("(shout \"hi\")").unwrap(),
            Value::string("HI")
        );
    }
}
