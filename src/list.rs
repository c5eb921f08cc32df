//! Lazy cons-like list nodes: the unit of memoisation.
//!
//! A node holds a fulfilled prefix (`Array`), an optional tail, and, while
//! still pending, the generator that will fulfill it. Forcing a node runs
//! its generator exactly once; every consumer shares the result.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::array::{Array, ItemKind};
use crate::error::{indefinite_op, Error, Result};
use crate::gen::{Gen, Pull};
use crate::value::{format_real, V};
use crate::vm::Thread;

struct ListState {
    gen: Option<Box<dyn Gen>>,
    array: Option<Arc<Array>>,
    next: Option<Arc<List>>,
}

/// One node of a lazy sequence. The element kind is fixed for the whole
/// chain; `finite` is a creation-time guarantee of termination.
pub struct List {
    kind: ItemKind,
    finite: bool,
    no_each: AtomicBool,
    state: Mutex<ListState>,
}

impl std::fmt::Debug for List {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("List")
            .field("kind", &self.kind)
            .field("finite", &self.finite)
            .finish_non_exhaustive()
    }
}

impl List {
    /// A packed node: all items materialised, no generator, no tail.
    pub fn packed(array: Array) -> Arc<List> {
        Arc::new(List {
            kind: array.kind(),
            finite: true,
            no_each: AtomicBool::new(false),
            state: Mutex::new(ListState {
                gen: None,
                array: Some(Arc::new(array)),
                next: None,
            }),
        })
    }

    /// The empty list of the given kind.
    pub fn nil(kind: ItemKind) -> Arc<List> {
        List::packed(Array::new(kind))
    }

    /// A pending node to be fulfilled by `gen`.
    pub fn from_gen(kind: ItemKind, finite: bool, gen: Box<dyn Gen>) -> Arc<List> {
        Arc::new(List {
            kind,
            finite,
            no_each: AtomicBool::new(false),
            state: Mutex::new(ListState {
                gen: Some(gen),
                array: None,
                next: None,
            }),
        })
    }

    #[inline]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    #[inline]
    pub fn finite(&self) -> bool {
        self.finite
    }

    pub fn no_each(&self) -> bool {
        self.no_each.load(Ordering::Relaxed)
    }

    pub fn set_no_each(&self) {
        self.no_each.store(true, Ordering::Relaxed);
    }

    /// Fully materialised single node.
    pub fn is_packed(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.gen.is_none() && st.next.is_none() && st.array.is_some()
    }

    /// Ensure this node is fulfilled, running its generator if necessary,
    /// and return the node's array and tail.
    pub fn forced(self: &Arc<Self>, th: &mut Thread) -> Result<(Arc<Array>, Option<Arc<List>>)> {
        let mut st = self.state.lock().unwrap();
        if let Some(array) = &st.array {
            return Ok((array.clone(), st.next.clone()));
        }
        let mut gen = match st.gen.take() {
            Some(gen) => gen,
            None => {
                // a node abandoned by an earlier error; treat as terminal
                let empty = Arc::new(Array::new(self.kind));
                st.array = Some(empty.clone());
                return Ok((empty, None));
            }
        };
        match gen.pull(th) {
            Ok(Pull::Fill(array)) => {
                let next = Arc::new(List {
                    kind: self.kind,
                    finite: self.finite,
                    no_each: AtomicBool::new(false),
                    state: Mutex::new(ListState {
                        gen: Some(gen),
                        array: None,
                        next: None,
                    }),
                });
                st.array = Some(array.clone());
                st.next = Some(next.clone());
                Ok((array, Some(next)))
            }
            Ok(Pull::FillLink(array, tail)) => {
                st.array = Some(array.clone());
                st.next = Some(tail.clone());
                Ok((array, Some(tail)))
            }
            Ok(Pull::Link(tail)) => {
                let empty = Arc::new(Array::new(self.kind));
                st.array = Some(empty.clone());
                st.next = Some(tail.clone());
                Ok((empty, Some(tail)))
            }
            Ok(Pull::End) => {
                let empty = Arc::new(Array::new(self.kind));
                st.array = Some(empty.clone());
                st.next = None;
                Ok((empty, None))
            }
            Err(e) => {
                // leave the node pending so a later consumer can retry
                st.gen = Some(gen);
                Err(e)
            }
        }
    }

    pub fn force(self: &Arc<Self>, th: &mut Thread) -> Result<()> {
        self.forced(th).map(|_| ())
    }

    /// The fulfilled prefix, if this node has been forced.
    pub fn array(&self) -> Option<Arc<Array>> {
        self.state.lock().unwrap().array.clone()
    }

    pub fn next(&self) -> Option<Arc<List>> {
        self.state.lock().unwrap().next.clone()
    }

    /// A forced node with no items and no tail: the terminal.
    pub fn is_end(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.gen.is_none()
            && st.next.is_none()
            && st.array.as_ref().map(|a| a.is_empty()).unwrap_or(false)
    }

    /// Materialise the whole chain into one packed node. Requires a
    /// finite list.
    pub fn pack(self: &Arc<Self>, th: &mut Thread) -> Result<Arc<List>> {
        if !self.finite {
            return Err(indefinite_op("pack"));
        }
        if self.is_packed() {
            return Ok(self.clone());
        }
        let mut out = Array::new(self.kind);
        let mut cur = self.clone();
        loop {
            let (array, next) = cur.forced(th)?;
            out.append(&array);
            match next {
                Some(tail) => cur = tail,
                None => break,
            }
        }
        Ok(List::packed(out))
    }

    /// Like `pack` but refuses lists longer than `limit`, returning
    /// `None` instead. Used to bound channel counts and expansions.
    pub fn pack_limit(self: &Arc<Self>, th: &mut Thread, limit: usize) -> Result<Option<Arc<List>>> {
        if !self.finite {
            return Err(indefinite_op("pack"));
        }
        let mut out = Array::new(self.kind);
        let mut cur = self.clone();
        loop {
            let (array, next) = cur.forced(th)?;
            if out.len() + array.len() > limit {
                return Ok(None);
            }
            out.append(&array);
            match next {
                Some(tail) => cur = tail,
                None => break,
            }
        }
        Ok(Some(List::packed(out)))
    }

    /// Force every node of a finite chain in place.
    pub fn force_all(self: &Arc<Self>, th: &mut Thread) -> Result<()> {
        let mut cur = self.clone();
        loop {
            let (_, next) = cur.forced(th)?;
            match next {
                Some(tail) => cur = tail,
                None => return Ok(()),
            }
        }
    }

    pub fn length(self: &Arc<Self>, th: &mut Thread) -> Result<i64> {
        if !self.finite {
            return Err(indefinite_op("length"));
        }
        let mut n = 0i64;
        let mut cur = self.clone();
        loop {
            let (array, next) = cur.forced(th)?;
            n += array.len() as i64;
            match next {
                Some(tail) => cur = tail,
                None => return Ok(n),
            }
        }
    }

    /// Element comparison of two finite lists; non-finite pairs compare
    /// false unless identical (checked by the caller).
    pub fn equals(a: &Arc<List>, b: &Arc<List>, th: &mut Thread) -> Result<bool> {
        if !a.finite || !b.finite {
            return Ok(false);
        }
        let mut aa = crate::input::BothIn::new(V::List(a.clone()));
        let mut bb = crate::input::BothIn::new(V::List(b.clone()));
        loop {
            let x = aa.one(th)?;
            let y = bb.one(th)?;
            match (x, y) {
                (None, None) => return Ok(true),
                (Some(x), Some(y)) => {
                    if !x.equals(th, &y)? {
                        return Ok(false);
                    }
                }
                _ => return Ok(false),
            }
        }
    }

    /// Force roughly `n` items of progress and return the remaining tail
    /// (node granular). Feedback consumers use this to keep a ref-held
    /// chain bounded.
    pub fn chase(self: &Arc<Self>, th: &mut Thread, n: i64) -> Result<Option<Arc<List>>> {
        let mut remaining = n;
        let mut cur = self.clone();
        while remaining > 0 {
            let (array, next) = cur.forced(th)?;
            remaining -= array.len() as i64;
            match next {
                Some(tail) => cur = tail,
                None => break,
            }
        }
        Ok(Some(cur))
    }

    // Packed-node indexing. Ops pack before indexing; an unpacked node
    // answers with the zero policy.
    pub fn at(&self, i: i64) -> V {
        match self.array() {
            Some(a) => a.at(i),
            None => V::Real(0.0),
        }
    }

    pub fn wrap_at(&self, i: i64) -> V {
        match self.array() {
            Some(a) => a.wrap_at(i),
            None => V::Real(0.0),
        }
    }

    pub fn clip_at(&self, i: i64) -> V {
        match self.array() {
            Some(a) => a.clip_at(i),
            None => V::Real(0.0),
        }
    }

    pub fn fold_at(&self, i: i64) -> V {
        match self.array() {
            Some(a) => a.fold_at(i),
            None => V::Real(0.0),
        }
    }

    pub fn atz(&self, i: i64) -> f64 {
        match self.array() {
            Some(a) => a.atz(i),
            None => 0.0,
        }
    }

    /// Print up to the thread's print length, forcing as needed.
    pub fn print(
        self: &Arc<Self>,
        th: &mut Thread,
        out: &mut String,
        depth: usize,
        budget: &mut i64,
    ) -> Result<()> {
        if self.kind == ItemKind::Z {
            out.push('#');
        }
        out.push('[');
        let mut printed = 0usize;
        let mut cur = self.clone();
        'outer: loop {
            let (array, next) = match cur.forced(th) {
                Ok(ok) => ok,
                Err(Error::StackOverflow) | Err(Error::StackUnderflow) => break,
                Err(e) => return Err(e),
            };
            for i in 0..array.len() {
                if printed >= th.vm.print_length || *budget <= 0 {
                    out.push_str(" ...");
                    break 'outer;
                }
                if printed > 0 {
                    out.push(' ');
                }
                *budget -= 1;
                match &*array {
                    Array::Z(z) => {
                        let _ = write!(out, "{}", format_real(z[i]));
                    }
                    Array::V(v) => v[i].print_limited(th, out, depth + 1, budget)?,
                }
                printed += 1;
            }
            match next {
                Some(tail) => cur = tail,
                None => break,
            }
        }
        out.push(']');
        Ok(())
    }
}
