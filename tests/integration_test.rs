//! End-to-end interpreter scenarios driven through the public facade.

use schemexp::{Error, Interpreter, Value};

#[test]
fn recursive_fibonacci() {
    let mut interp = Interpreter::new();
    interp
        .eval_str("(define (fib n) (if (< n 2) n (+ (fib (- n 1)) (fib (- n 2)))))")
        .unwrap();
    assert_eq!(interp.eval_str("(fib 6)").unwrap(), Value::Integer(8));
    assert_eq!(interp.eval_str("(fib 10)").unwrap(), Value::Integer(55));
}

#[test]
fn church_encoded_pairs() {
    // Shadow the pair primitives with closure-based encodings; selection
    // happens entirely through procedure application.
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define (cons x y) (lambda (m) (m x y)))
             (define (car z) (z (lambda (p q) p)))
             (define (cdr z) (z (lambda (p q) q)))",
        )
        .unwrap();
    assert_eq!(
        interp
            .eval_str("(car (cdr (cons 2 (cons 1 '()))))")
            .unwrap(),
        Value::Integer(1)
    );
}

#[test]
fn heavy_allocation_and_reclamation() {
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define allocate-tons
               (lambda (n xs)
                 (if (eq? n 0) xs (allocate-tons (- n 1) (cons n xs)))))",
        )
        .unwrap();

    interp.eval_str("(define tons (allocate-tons 10000 '()))").unwrap();
    assert_eq!(interp.eval_str("(car tons)").unwrap(), Value::Integer(1));
    assert_eq!(
        interp.eval_str("(length tons)").unwrap(),
        Value::Integer(10000)
    );
    let populated = interp.heap().stats().live_pairs;
    assert!(populated >= 10000);

    // Rebinding drops the only reference; the chain must be reclaimed and
    // a second run must succeed in the recycled space.
    interp.eval_str("(set! tons '())").unwrap();
    interp.collect_garbage(&[]);
    assert!(interp.heap().stats().live_pairs < populated / 10);

    interp.eval_str("(set! tons (allocate-tons 10000 '()))").unwrap();
    assert_eq!(interp.eval_str("(car tons)").unwrap(), Value::Integer(1));
}

#[test]
fn counters_close_over_their_own_state() {
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define make-counter
               (lambda ()
                 (define n 0)
                 (lambda () (set! n (+ n 1)) n)))",
        )
        .unwrap();
    interp.eval_str("(define c (make-counter))").unwrap();
    assert_eq!(interp.eval_str("(c)").unwrap(), Value::Integer(1));
    assert_eq!(interp.eval_str("(c)").unwrap(), Value::Integer(2));
    assert_eq!(interp.eval_str("(c)").unwrap(), Value::Integer(3));

    // A second counter has its own activation frame.
    interp.eval_str("(define d (make-counter))").unwrap();
    assert_eq!(interp.eval_str("(d)").unwrap(), Value::Integer(1));
    assert_eq!(interp.eval_str("(c)").unwrap(), Value::Integer(4));
}

#[test]
fn unbound_variable_reports_the_name() {
    let mut interp = Interpreter::new();
    assert_eq!(
        interp.eval_str("(+ x 1)").unwrap_err(),
        Error::UnboundVariable("x".to_string())
    );
}

#[test]
fn parameter_shadowing_leaves_globals_alone() {
    let mut interp = Interpreter::new();
    interp.eval_str("(define x 99)").unwrap();
    assert_eq!(
        interp.eval_str("((lambda (x) x) 5)").unwrap(),
        Value::Integer(5)
    );
    assert_eq!(interp.eval_str("x").unwrap(), Value::Integer(99));
}

#[test]
fn nested_defines_stay_local() {
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define (outer)
               (define hidden 42)
               hidden)",
        )
        .unwrap();
    assert_eq!(interp.eval_str("(outer)").unwrap(), Value::Integer(42));
    assert!(matches!(
        interp.eval_str("hidden").unwrap_err(),
        Error::UnboundVariable(_)
    ));
}

#[test]
fn quoted_data_survives_collection() {
    let mut interp = Interpreter::new();
    interp
        .eval_str("(define tree '((1 2) (3 (4 5))))")
        .unwrap();
    interp.collect_garbage(&[]);
    let tree = interp.eval_str("tree").unwrap();
    assert_eq!(interp.render(&tree), "((1 2) (3 (4 5)))");
}

#[test]
fn compound_procedures_render_without_their_environment() {
    let mut interp = Interpreter::new();
    interp.eval_str("(define (inc n) (+ n 1))").unwrap();
    let rendered = {
        let v = interp.eval_str("inc").unwrap();
        interp.render(&v)
    };
    assert_eq!(rendered, "(compound-procedure (n) ((+ n 1)) <procedure-env>)");
}

#[test]
fn mutual_recursion_through_the_global_frame() {
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define (even? n) (if (= n 0) #t (odd? (- n 1))))
             (define (odd? n) (if (= n 0) #f (even? (- n 1))))",
        )
        .unwrap();
    assert_eq!(interp.eval_str("(even? 10)").unwrap(), Value::Boolean(true));
    assert_eq!(interp.eval_str("(odd? 7)").unwrap(), Value::Boolean(true));
    assert_eq!(interp.eval_str("(even? 7)").unwrap(), Value::Boolean(false));
}

#[test]
fn circular_structure_is_collected() {
    let mut interp = Interpreter::new();
    interp
        .eval_str(
            "(define knot (cons 1 (cons 2 '())))
             (set-cdr! (cdr knot) knot)",
        )
        .unwrap();
    interp.collect_garbage(&[]);
    let with_cycle = interp.heap().stats().live_pairs;
    assert!(with_cycle >= 2);

    // The two cells keep each other alive, so only a tracing collection
    // can reclaim them once the binding is gone.
    interp.eval_str("(set! knot '())").unwrap();
    interp.collect_garbage(&[]);
    assert!(interp.heap().stats().live_pairs <= with_cycle - 2);
}
