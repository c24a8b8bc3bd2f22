//! Heap management. Pairs, environment frames, and compound procedures are
//! allocated out of typed arenas and addressed by copyable indices, so the
//! shared and mutable parts of the object graph live in one place.
//!
//! Closures capture frames, frames hold closures, and `set-cdr!` can tie
//! pairs into knots, so the reachable graph is cyclic in general and
//! reference counting alone cannot reclaim it. The heap therefore provides
//! a mark-and-sweep [`Heap::collect_garbage`] whose roots the caller
//! supplies. Collection is expected to run between evaluations (the driver
//! decides when); nothing inside an in-flight evaluation triggers it, so
//! temporaries never need explicit rooting.
//!
//! The heap also owns the symbol interner: two textually identical symbols
//! resolve to the same [`Sym`], making symbol equality an id comparison.

use string_interner::{DefaultBackend, DefaultSymbol, StringInterner};

use crate::environment::{Environment, Frame};
use crate::value::{Lambda, PairCell, Value};

/// An interned symbol id.
pub type Sym = DefaultSymbol;

/// An arena of `T` slots with a free list. Freed slots are reused before
/// the pool grows.
struct Arena<T> {
    pool: Vec<Option<T>>,
    free: Vec<usize>,
    marks: Vec<bool>,
}

impl<T> Arena<T> {
    fn new() -> Arena<T> {
        Arena {
            pool: Vec::new(),
            free: Vec::new(),
            marks: Vec::new(),
        }
    }

    fn allocate(&mut self, item: T) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.pool[index] = Some(item);
                index
            }
            None => {
                self.pool.push(Some(item));
                self.marks.push(false);
                self.pool.len() - 1
            }
        }
    }

    fn get(&self, index: usize) -> &T {
        self.pool[index]
            .as_ref()
            .expect("dangling heap reference: slot was swept")
    }

    fn get_mut(&mut self, index: usize) -> &mut T {
        self.pool[index]
            .as_mut()
            .expect("dangling heap reference: slot was swept")
    }

    fn live(&self) -> usize {
        self.pool.len() - self.free.len()
    }

    fn clear_marks(&mut self) {
        for mark in &mut self.marks {
            *mark = false;
        }
    }

    /// Mark a slot; returns true the first time, false if already marked.
    fn mark(&mut self, index: usize) -> bool {
        if self.marks[index] {
            false
        } else {
            self.marks[index] = true;
            true
        }
    }

    /// Drop every unmarked occupied slot and put it back on the free list.
    fn sweep(&mut self) {
        for (index, slot) in self.pool.iter_mut().enumerate() {
            if slot.is_some() && !self.marks[index] {
                *slot = None;
                self.free.push(index);
            }
        }
    }
}

macro_rules! arena_ref {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub(crate) fn new(index: usize) -> $name {
                $name(index as u32)
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

arena_ref! {
    /// Index of a cons cell in the heap.
    PairRef
}
arena_ref! {
    /// Index of an environment frame in the heap.
    FrameRef
}
arena_ref! {
    /// Index of a compound procedure in the heap.
    LambdaRef
}

/// Interned ids of the special-form tags and other symbols the evaluator
/// compares against on every dispatch.
pub(crate) struct SpecialSymbols {
    pub quote: Sym,
    pub set_bang: Sym,
    pub define: Sym,
    pub if_: Sym,
    pub lambda: Sym,
    pub begin: Sym,
    /// Returned by `define` and `set!`.
    pub ok: Sym,
}

/// Counts of live heap objects, for tests and the REPL's `:gc` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub live_pairs: usize,
    pub live_frames: usize,
    pub live_lambdas: usize,
}

impl HeapStats {
    pub fn total(&self) -> usize {
        self.live_pairs + self.live_frames + self.live_lambdas
    }
}

/// The interpreter heap: arenas for pairs, frames, and closures, plus the
/// symbol interner.
pub struct Heap {
    pairs: Arena<PairCell>,
    frames: Arena<Frame>,
    lambdas: Arena<Lambda>,
    symbols: StringInterner<DefaultBackend>,
    specials: SpecialSymbols,
}

impl Default for Heap {
    fn default() -> Self {
        Self::new()
    }
}

impl Heap {
    pub fn new() -> Heap {
        let mut symbols = StringInterner::<DefaultBackend>::new();
        let specials = SpecialSymbols {
            quote: symbols.get_or_intern("quote"),
            set_bang: symbols.get_or_intern("set!"),
            define: symbols.get_or_intern("define"),
            if_: symbols.get_or_intern("if"),
            lambda: symbols.get_or_intern("lambda"),
            begin: symbols.get_or_intern("begin"),
            ok: symbols.get_or_intern("ok"),
        };
        Heap {
            pairs: Arena::new(),
            frames: Arena::new(),
            lambdas: Arena::new(),
            symbols,
            specials,
        }
    }

    // ----- symbols -----

    /// Intern a symbol name, returning the same id for the same text.
    pub fn intern(&mut self, name: &str) -> Sym {
        self.symbols.get_or_intern(name)
    }

    /// Resolve an interned symbol back to its text.
    pub fn symbol_name(&self, sym: Sym) -> &str {
        self.symbols
            .resolve(sym)
            .expect("symbol id from a foreign interner")
    }

    pub(crate) fn specials(&self) -> &SpecialSymbols {
        &self.specials
    }

    /// The `ok` symbol returned by `define` and `set!`.
    pub fn ok_symbol(&self) -> Value {
        Value::Symbol(self.specials.ok)
    }

    // ----- pairs -----

    /// Allocate a fresh pair.
    pub fn cons(&mut self, car: Value, cdr: Value) -> Value {
        let index = self.pairs.allocate(PairCell { car, cdr });
        Value::Pair(PairRef::new(index))
    }

    /// Build a proper list from the given items.
    pub fn list(&mut self, items: &[Value]) -> Value {
        let mut result = Value::EmptyList;
        for item in items.iter().rev() {
            result = self.cons(item.clone(), result);
        }
        result
    }

    pub fn car(&self, pair: PairRef) -> Value {
        self.pairs.get(pair.index()).car.clone()
    }

    pub fn cdr(&self, pair: PairRef) -> Value {
        self.pairs.get(pair.index()).cdr.clone()
    }

    pub fn set_car(&mut self, pair: PairRef, value: Value) {
        self.pairs.get_mut(pair.index()).car = value;
    }

    pub fn set_cdr(&mut self, pair: PairRef, value: Value) {
        self.pairs.get_mut(pair.index()).cdr = value;
    }

    /// Collect the items of a proper list; `None` when the value is neither
    /// `()` nor a `()`-terminated chain of pairs.
    pub fn list_items(&self, value: &Value) -> Option<Vec<Value>> {
        let mut items = Vec::new();
        let mut rest = value.clone();
        loop {
            match rest {
                Value::EmptyList => return Some(items),
                Value::Pair(p) => {
                    items.push(self.car(p));
                    rest = self.cdr(p);
                }
                _ => return None,
            }
        }
    }

    /// Length of a proper list, or `None` for improper lists and non-lists.
    pub fn list_len(&self, value: &Value) -> Option<usize> {
        let mut len = 0;
        let mut rest = value.clone();
        loop {
            match rest {
                Value::EmptyList => return Some(len),
                Value::Pair(p) => {
                    len += 1;
                    rest = self.cdr(p);
                }
                _ => return None,
            }
        }
    }

    // ----- frames -----

    pub(crate) fn allocate_frame(&mut self, frame: Frame) -> FrameRef {
        FrameRef::new(self.frames.allocate(frame))
    }

    pub(crate) fn frame(&self, frame: FrameRef) -> &Frame {
        self.frames.get(frame.index())
    }

    pub(crate) fn frame_mut(&mut self, frame: FrameRef) -> &mut Frame {
        self.frames.get_mut(frame.index())
    }

    // ----- compound procedures -----

    pub(crate) fn allocate_lambda(&mut self, lambda: Lambda) -> LambdaRef {
        LambdaRef::new(self.lambdas.allocate(lambda))
    }

    pub(crate) fn lambda(&self, lambda: LambdaRef) -> &Lambda {
        self.lambdas.get(lambda.index())
    }

    // ----- garbage collection -----

    /// Trace from the given roots, then sweep everything unreachable.
    ///
    /// Uses an explicit worklist so arbitrarily deep (and cyclic) object
    /// graphs are traced in constant Rust stack. The caller must pass every
    /// environment and value it intends to keep using; anything else is
    /// fair game.
    pub fn collect_garbage(&mut self, env_roots: &[Environment], value_roots: &[Value]) {
        self.pairs.clear_marks();
        self.frames.clear_marks();
        self.lambdas.clear_marks();

        let mut pending: Vec<GcThing> = Vec::new();
        for env in env_roots {
            trace_environment(env, &mut pending);
        }
        for value in value_roots {
            trace_value(value, &mut pending);
        }

        while let Some(thing) = pending.pop() {
            match thing {
                GcThing::Pair(p) => {
                    if self.pairs.mark(p.index()) {
                        let cell = self.pairs.get(p.index());
                        trace_value(&cell.car, &mut pending);
                        trace_value(&cell.cdr, &mut pending);
                    }
                }
                GcThing::Frame(f) => {
                    if self.frames.mark(f.index()) {
                        let frame = self.frames.get(f.index());
                        for value in frame.values() {
                            trace_value(value, &mut pending);
                        }
                        trace_environment(&frame.parent(), &mut pending);
                    }
                }
                GcThing::Lambda(l) => {
                    if self.lambdas.mark(l.index()) {
                        let lambda = self.lambdas.get(l.index());
                        trace_value(&lambda.body, &mut pending);
                        trace_environment(&lambda.env, &mut pending);
                    }
                }
            }
        }

        self.pairs.sweep();
        self.frames.sweep();
        self.lambdas.sweep();
    }

    pub fn stats(&self) -> HeapStats {
        HeapStats {
            live_pairs: self.pairs.live(),
            live_frames: self.frames.live(),
            live_lambdas: self.lambdas.live(),
        }
    }
}

/// A heap-allocated object awaiting tracing.
#[derive(Debug, Clone, Copy)]
enum GcThing {
    Pair(PairRef),
    Frame(FrameRef),
    Lambda(LambdaRef),
}

fn trace_value(value: &Value, pending: &mut Vec<GcThing>) {
    match value {
        Value::Pair(p) => pending.push(GcThing::Pair(*p)),
        Value::Compound(l) => pending.push(GcThing::Lambda(*l)),
        // Atoms hold no heap references.
        _ => {}
    }
}

fn trace_environment(env: &Environment, pending: &mut Vec<GcThing>) {
    if let Some(head) = env.head() {
        pending.push(GcThing::Frame(head));
    }
}
