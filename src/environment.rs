//! The environment binding symbols to values.
//!
//! An environment is an ordered chain of frames, innermost first,
//! terminated by the distinguished empty environment. Each frame maps
//! interned symbols to value cells that are mutable in place, so a `set!`
//! observed through any alias of the frame takes effect everywhere.
//!
//! Frames live in the heap (closures capture them, and captured frames can
//! outlive the call that created them), so [`Environment`] itself is just a
//! copyable handle: the head frame reference, or nothing for the empty
//! environment.
//!
//! Binding discipline: `define` acts on the head frame only, which is what
//! makes a `define` inside a procedure body introduce a local binding
//! instead of clobbering an enclosing one. `set!` follows the full chain
//! and is the sole mechanism for mutating captured variables across
//! closures.

use std::collections::HashMap;

use crate::heap::{FrameRef, Heap, Sym};
use crate::value::Value;
use crate::Error;

/// One level of bindings.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    bindings: HashMap<Sym, Value>,
    parent: Environment,
}

impl Frame {
    fn new(parent: Environment) -> Frame {
        Frame {
            bindings: HashMap::new(),
            parent,
        }
    }

    pub(crate) fn parent(&self) -> Environment {
        self.parent
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.bindings.values()
    }

    pub(crate) fn entries(&self) -> Vec<(Sym, Value)> {
        self.bindings
            .iter()
            .map(|(sym, value)| (*sym, value.clone()))
            .collect()
    }
}

/// A handle to a chain of frames; `Environment::empty()` is the
/// distinguished terminator with no frames at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Environment {
    head: Option<FrameRef>,
}

impl Environment {
    /// The empty environment. Contains no frames; every lookup against it
    /// fails with an unbound-variable error.
    pub fn empty() -> Environment {
        Environment { head: None }
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn head(&self) -> Option<FrameRef> {
        self.head
    }

    /// Prepend a fresh, empty frame to `base`.
    pub fn new_frame(heap: &mut Heap, base: Environment) -> Environment {
        let head = heap.allocate_frame(Frame::new(base));
        Environment { head: Some(head) }
    }

    /// Prepend a fresh frame binding each parameter to the corresponding
    /// argument. Fails with an arity mismatch when the lists differ in
    /// length; the error distinguishes too many arguments from too few.
    pub fn extend(
        heap: &mut Heap,
        params: &[Sym],
        args: Vec<Value>,
        base: Environment,
    ) -> Result<Environment, Error> {
        if params.len() != args.len() {
            return Err(Error::arity_mismatch(params.len(), args.len()));
        }
        let mut frame = Frame::new(base);
        for (param, arg) in params.iter().zip(args) {
            frame.bindings.insert(*param, arg);
        }
        let head = heap.allocate_frame(frame);
        Ok(Environment { head: Some(head) })
    }

    /// Walk the chain head to tail and return the first binding for `sym`.
    pub fn lookup(&self, heap: &Heap, sym: Sym) -> Result<Value, Error> {
        let mut current = *self;
        while let Some(frame_ref) = current.head {
            let frame = heap.frame(frame_ref);
            if let Some(value) = frame.bindings.get(&sym) {
                return Ok(value.clone());
            }
            current = frame.parent;
        }
        Err(Error::UnboundVariable(heap.symbol_name(sym).to_string()))
    }

    /// Mutate the first frame containing `sym` to hold `value`. Never
    /// creates a new binding; fails when no frame binds the symbol.
    pub fn assign(&self, heap: &mut Heap, sym: Sym, value: Value) -> Result<(), Error> {
        let mut current = *self;
        while let Some(frame_ref) = current.head {
            if heap.frame(frame_ref).bindings.contains_key(&sym) {
                heap.frame_mut(frame_ref).bindings.insert(sym, value);
                return Ok(());
            }
            current = heap.frame(frame_ref).parent;
        }
        Err(Error::UnboundVariable(heap.symbol_name(sym).to_string()))
    }

    /// Bind `sym` in the head frame, overwriting any existing binding
    /// there. Never traverses enclosing frames.
    pub fn define(&self, heap: &mut Heap, sym: Sym, value: Value) -> Result<(), Error> {
        match self.head {
            Some(frame_ref) => {
                heap.frame_mut(frame_ref).bindings.insert(sym, value);
                Ok(())
            }
            None => Err(Error::EvalError(
                "cannot define in the empty environment".to_string(),
            )),
        }
    }

    /// All bindings visible from this environment, innermost binding
    /// winning, sorted by name. For the REPL's `:env` command.
    pub fn visible_bindings(&self, heap: &Heap) -> Vec<(String, Value)> {
        let mut seen: HashMap<Sym, Value> = HashMap::new();
        let mut current = *self;
        while let Some(frame_ref) = current.head {
            let frame = heap.frame(frame_ref);
            for (sym, value) in frame.entries() {
                seen.entry(sym).or_insert(value);
            }
            current = frame.parent;
        }
        let mut result: Vec<_> = seen
            .into_iter()
            .map(|(sym, value)| (heap.symbol_name(sym).to_string(), value))
            .collect();
        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArityDirection;

    fn env_with(heap: &mut Heap, bindings: &[(&str, Value)]) -> Environment {
        let env = Environment::new_frame(heap, Environment::empty());
        for (name, value) in bindings {
            let sym = heap.intern(name);
            env.define(heap, sym, value.clone()).unwrap();
        }
        env
    }

    #[test]
    fn lookup_walks_frames_innermost_first() {
        let mut heap = Heap::new();
        let x = heap.intern("x");
        let y = heap.intern("y");

        let outer = env_with(&mut heap, &[("x", Value::Integer(1)), ("y", Value::Integer(2))]);
        let inner = Environment::extend(&mut heap, &[x], vec![Value::Integer(10)], outer).unwrap();

        assert_eq!(inner.lookup(&heap, x).unwrap(), Value::Integer(10));
        assert_eq!(inner.lookup(&heap, y).unwrap(), Value::Integer(2));
        assert_eq!(outer.lookup(&heap, x).unwrap(), Value::Integer(1));
    }

    #[test]
    fn lookup_on_empty_environment_is_unbound() {
        let mut heap = Heap::new();
        let x = heap.intern("x");
        let err = Environment::empty().lookup(&heap, x).unwrap_err();
        assert_eq!(err, Error::UnboundVariable("x".to_string()));
    }

    #[test]
    fn assign_mutates_first_containing_frame() {
        let mut heap = Heap::new();
        let x = heap.intern("x");

        let outer = env_with(&mut heap, &[("x", Value::Integer(1))]);
        let inner = Environment::new_frame(&mut heap, outer);

        // `x` lives in the outer frame; assignment through the inner
        // environment must reach it.
        inner.assign(&mut heap, x, Value::Integer(7)).unwrap();
        assert_eq!(outer.lookup(&heap, x).unwrap(), Value::Integer(7));
    }

    #[test]
    fn assign_never_creates_bindings() {
        let mut heap = Heap::new();
        let missing = heap.intern("missing");
        let env = env_with(&mut heap, &[]);

        let err = env.assign(&mut heap, missing, Value::Integer(1)).unwrap_err();
        assert_eq!(err, Error::UnboundVariable("missing".to_string()));
        assert!(env.lookup(&heap, missing).is_err());
    }

    #[test]
    fn define_acts_on_head_frame_only() {
        let mut heap = Heap::new();
        let x = heap.intern("x");

        let outer = env_with(&mut heap, &[("x", Value::Integer(1))]);
        let inner = Environment::new_frame(&mut heap, outer);

        // Shadow in the inner frame, leaving the outer binding alone.
        inner.define(&mut heap, x, Value::Integer(99)).unwrap();
        assert_eq!(inner.lookup(&heap, x).unwrap(), Value::Integer(99));
        assert_eq!(outer.lookup(&heap, x).unwrap(), Value::Integer(1));

        // Redefinition in the same frame overwrites.
        inner.define(&mut heap, x, Value::Integer(100)).unwrap();
        assert_eq!(inner.lookup(&heap, x).unwrap(), Value::Integer(100));
    }

    #[test]
    fn extend_checks_arity_in_both_directions() {
        let mut heap = Heap::new();
        let a = heap.intern("a");
        let base = Environment::empty();

        let too_many =
            Environment::extend(&mut heap, &[a], vec![Value::Integer(1), Value::Integer(2)], base)
                .unwrap_err();
        assert_eq!(too_many.arity_direction(), Some(ArityDirection::TooMany));

        let too_few = Environment::extend(&mut heap, &[a], vec![], base).unwrap_err();
        assert_eq!(too_few.arity_direction(), Some(ArityDirection::TooFew));
    }
}
