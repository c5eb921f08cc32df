//! Sequence sources and structural operations.
//!
//! Every source here is a generator in the pull protocol: a prim builds
//! the generator, wraps it in a list node, and pushes it; nothing runs
//! until a consumer pulls.

use std::sync::Arc;

use crate::array::{Array, ItemKind};
use crate::error::{indefinite_op, wrong_type, Error, Result};
use crate::gen::{z_block_size, Gen, Pull};
use crate::input::{BothIn, VIn, ZIn, ZRun};
use crate::list::List;
use crate::math::{binary_op, OP_ADD, OP_MUL};
use crate::value::V;
use crate::vm::{def, def_automap, def_mcx, def_no_each, Thread};
use crate::workspace::GTable;

const ONE_THIRD: f64 = 1.0 / 3.0;

// --- sources ---

/// The same value forever.
struct Ever {
    v: V,
}

impl Gen for Ever {
    fn type_name(&self) -> &'static str {
        "Ever"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.v.clone());
        Ok(Pull::fill(out))
    }
}

/// The same sample forever.
struct Everz {
    z: f64,
    block: usize,
}

impl Gen for Everz {
    fn type_name(&self) -> &'static str {
        "Everz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        for _ in 0..self.block {
            out.pushz(self.z);
        }
        Ok(Pull::fill(out))
    }
}

/// Arithmetic series over values; the step may itself be a list.
struct By {
    start: V,
    step: V,
}

impl Gen for By {
    fn type_name(&self) -> &'static str {
        "By"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.start.clone());
        self.start = binary_op(th, &OP_ADD, &self.start, &self.step)?;
        Ok(Pull::fill(out))
    }
}

struct NBy {
    start: V,
    step: V,
    n: i64,
}

impl Gen for NBy {
    fn type_name(&self) -> &'static str {
        "NBy"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.start.clone());
        self.start = binary_op(th, &OP_ADD, &self.start, &self.step)?;
        self.n -= 1;
        Ok(Pull::fill(out))
    }
}

/// Arithmetic series as a signal.
struct Byz {
    start: f64,
    step: f64,
    block: usize,
}

impl Gen for Byz {
    fn type_name(&self) -> &'static str {
        "Byz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        let mut x = self.start;
        for _ in 0..self.block {
            out.pushz(x);
            x += self.step;
        }
        self.start = x;
        Ok(Pull::fill(out))
    }
}

struct NByz {
    start: f64,
    step: f64,
    n: i64,
    block: usize,
}

impl Gen for NByz {
    fn type_name(&self) -> &'static str {
        "NByz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        let mut x = self.start;
        for _ in 0..n {
            out.pushz(x);
            x += self.step;
        }
        self.start = x;
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

/// Geometric series over values.
struct Grow {
    start: V,
    step: V,
}

impl Gen for Grow {
    fn type_name(&self) -> &'static str {
        "Grow"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.start.clone());
        self.start = binary_op(th, &OP_MUL, &self.start, &self.step)?;
        Ok(Pull::fill(out))
    }
}

struct NGrow {
    start: V,
    step: V,
    n: i64,
}

impl Gen for NGrow {
    fn type_name(&self) -> &'static str {
        "NGrow"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.start.clone());
        self.start = binary_op(th, &OP_MUL, &self.start, &self.step)?;
        self.n -= 1;
        Ok(Pull::fill(out))
    }
}

struct Growz {
    start: f64,
    step: f64,
    block: usize,
}

impl Gen for Growz {
    fn type_name(&self) -> &'static str {
        "Growz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        let mut x = self.start;
        for _ in 0..self.block {
            out.pushz(x);
            x *= self.step;
        }
        self.start = x;
        Ok(Pull::fill(out))
    }
}

struct NGrowz {
    start: f64,
    step: f64,
    n: i64,
    block: usize,
}

impl Gen for NGrowz {
    fn type_name(&self) -> &'static str {
        "NGrowz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        let mut x = self.start;
        for _ in 0..n {
            out.pushz(x);
            x *= self.step;
        }
        self.start = x;
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

/// Cubed line segment: carries an exponential-like curve through zero.
struct NCubicLinez {
    start: f64,
    step: f64,
    n: i64,
    block: usize,
}

impl Gen for NCubicLinez {
    fn type_name(&self) -> &'static str {
        "NCubicLinez"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        let mut x = self.start;
        for _ in 0..n {
            out.pushz(x * x * x);
            x += self.step;
        }
        self.start = x;
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

struct Fib {
    a: V,
    b: V,
}

impl Gen for Fib {
    fn type_name(&self) -> &'static str {
        "Fib"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::V, 1);
        let a = self.a.clone();
        out.push(a.clone());
        self.a = self.b.clone();
        self.b = binary_op(th, &OP_ADD, &a, &self.b)?;
        Ok(Pull::fill(out))
    }
}

struct Fibz {
    a: f64,
    b: f64,
    block: usize,
}

impl Gen for Fibz {
    fn type_name(&self) -> &'static str {
        "Fibz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        let mut a = self.a;
        let mut b = self.b;
        for _ in 0..self.block {
            out.pushz(a);
            let t = a;
            a = b;
            b += t;
        }
        self.a = a;
        self.b = b;
        Ok(Pull::fill(out))
    }
}

/// Reciprocals 1, 1/2, 1/3 ...
struct NInvz {
    start: f64,
    n: i64,
    block: usize,
}

impl Gen for NInvz {
    fn type_name(&self) -> &'static str {
        "NInvz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        let mut x = self.start;
        for _ in 0..n {
            out.pushz(1.0 / x);
            x += 1.0;
        }
        self.start = x;
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

struct Silence {
    n: i64,
    block: usize,
}

impl Gen for Silence {
    fn type_name(&self) -> &'static str {
        "Silence"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        for _ in 0..n {
            out.pushz(0.0);
        }
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

/// `n` copies of one value.
struct Repeat {
    v: V,
    n: i64,
}

impl Gen for Repeat {
    fn type_name(&self) -> &'static str {
        "Repeat"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(self.v.clone());
        self.n -= 1;
        Ok(Pull::fill(out))
    }
}

struct Repeatz {
    z: f64,
    n: i64,
    block: usize,
}

impl Gen for Repeatz {
    fn type_name(&self) -> &'static str {
        "Repeatz"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let n = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        for _ in 0..n {
            out.pushz(self.z);
        }
        self.n -= n as i64;
        Ok(Pull::fill(out))
    }
}

/// Results of a fun applied to a running counter, `n` times (or forever
/// when `n` is negative).
struct RepeatFun {
    f: V,
    i: i64,
    n: i64,
}

impl Gen for RepeatFun {
    fn type_name(&self) -> &'static str {
        "RepeatFun"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.n == 0 {
            return Ok(Pull::End);
        }
        let results = th.apply_with(&self.f, vec![V::Real(self.i as f64)])?;
        self.i += 1;
        if self.n > 0 {
            self.n -= 1;
        }
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(results.into_iter().next().unwrap_or_default());
        Ok(Pull::fill(out))
    }
}

// --- structure ---

/// Cycle a finite list forever, re-serving its fulfilled arrays.
struct Cyc {
    first: Arc<List>,
    cur: Option<Arc<List>>,
}

impl Gen for Cyc {
    fn type_name(&self) -> &'static str {
        "Cyc"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let node = self.cur.take().unwrap_or_else(|| self.first.clone());
        let (array, next) = node.forced(th)?;
        self.cur = next;
        Ok(Pull::Fill(array))
    }
}

/// Cycle a finite list `n` times.
struct NCyc {
    first: Arc<List>,
    cur: Option<Arc<List>>,
    n: i64,
}

impl Gen for NCyc {
    fn type_name(&self) -> &'static str {
        "NCyc"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let node = match self.cur.take() {
            Some(node) => node,
            None => {
                if self.n <= 1 {
                    return Ok(Pull::End);
                }
                self.n -= 1;
                self.first.clone()
            }
        };
        let (array, next) = node.forced(th)?;
        self.cur = next;
        Ok(Pull::Fill(array))
    }
}

/// A finite prefix followed by another sequence, spliced in as the tail.
struct Append {
    cur: Option<Arc<List>>,
    tail: V,
    kind: ItemKind,
}

fn tail_list(th: &mut Thread, tail: &V, kind: ItemKind) -> Result<Arc<List>> {
    match tail {
        V::List(list) => {
            if list.kind() == kind {
                Ok(list.clone())
            } else {
                Err(wrong_type(
                    "$ : tail",
                    if kind == ItemKind::V { "VList" } else { "ZList" },
                    tail.type_name(),
                ))
            }
        }
        V::Real(z) => Ok(match kind {
            ItemKind::Z => List::from_gen(
                ItemKind::Z,
                false,
                Box::new(Everz {
                    z: *z,
                    block: z_block_size(th),
                }),
            ),
            ItemKind::V => List::from_gen(ItemKind::V, false, Box::new(Ever { v: tail.clone() })),
        }),
        V::Fun(_) | V::Prim(_) => {
            let results = th.apply_with(tail, Vec::new())?;
            let v = results.into_iter().next().unwrap_or_default();
            tail_list(th, &v, kind)
        }
        other => Err(wrong_type("$ : tail", "List, Real or Fun", other.type_name())),
    }
}

impl Gen for Append {
    fn type_name(&self) -> &'static str {
        "Append"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        match self.cur.take() {
            Some(node) => {
                let (array, next) = node.forced(th)?;
                match next {
                    Some(tail) => {
                        self.cur = Some(tail);
                        Ok(Pull::Fill(array))
                    }
                    None => {
                        let tail = tail_list(th, &self.tail, self.kind)?;
                        Ok(Pull::FillLink(array, tail))
                    }
                }
            }
            None => Ok(Pull::End),
        }
    }
}

/// First `n` items of a stream.
struct TakeV {
    a: VIn,
    n: i64,
}

impl Gen for TakeV {
    fn type_name(&self) -> &'static str {
        "TakeV"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        match self.a.one(th)? {
            None => Ok(Pull::End),
            Some(x) => {
                self.n -= 1;
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.push(x);
                Ok(Pull::fill(out))
            }
        }
    }
}

/// First `n` samples of a signal.
struct TakeZ {
    a: ZIn,
    n: i64,
    block: usize,
}

impl Gen for TakeZ {
    fn type_name(&self) -> &'static str {
        "TakeZ"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.n <= 0 {
            return Ok(Pull::End);
        }
        let want = (self.n as usize).min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, want);
        while out.len() < want {
            let k = match self.a.run(th, want - out.len())? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    for _ in out.len()..want {
                        out.pushz(c);
                    }
                    want
                }
                ZRun::Items(items) => {
                    for &x in items {
                        out.pushz(x);
                    }
                    items.len()
                }
            };
            self.a.advance(k);
        }
        if out.is_empty() {
            return Ok(Pull::End);
        }
        self.n -= out.len() as i64;
        Ok(Pull::fill(out))
    }
}

/// A stream with its first `skip` items dropped.
struct TailV {
    a: VIn,
    skip: i64,
}

impl Gen for TailV {
    fn type_name(&self) -> &'static str {
        "TailV"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        while self.skip > 0 {
            if self.a.one(th)?.is_none() {
                return Ok(Pull::End);
            }
            self.skip -= 1;
        }
        match self.a.one(th)? {
            None => Ok(Pull::End),
            Some(x) => {
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.push(x);
                Ok(Pull::fill(out))
            }
        }
    }
}

/// A signal with its first `skip` samples dropped.
struct TailZ {
    a: ZIn,
    skip: i64,
    block: usize,
}

impl Gen for TailZ {
    fn type_name(&self) -> &'static str {
        "TailZ"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        if self.skip > 0 {
            if self.a.hop(th, self.skip as usize)? {
                return Ok(Pull::End);
            }
            self.skip = 0;
        }
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        while out.len() < self.block {
            let k = match self.a.run(th, self.block - out.len())? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    for _ in out.len()..self.block {
                        out.pushz(c);
                    }
                    self.block
                }
                ZRun::Items(items) => {
                    for &x in items {
                        out.pushz(x);
                    }
                    items.len()
                }
            };
            self.a.advance(k);
        }
        if out.is_empty() {
            Ok(Pull::End)
        } else {
            Ok(Pull::fill(out))
        }
    }
}

/// Coerce a stream to a signal.
struct ZfromV {
    a: BothIn,
    block: usize,
}

impl Gen for ZfromV {
    fn type_name(&self) -> &'static str {
        "ZfromV"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        while out.len() < self.block {
            match self.a.onez(th)? {
                None => break,
                Some(z) => out.pushz(z),
            }
        }
        if out.is_empty() {
            Ok(Pull::End)
        } else {
            Ok(Pull::fill(out))
        }
    }
}

/// Coerce a signal to a stream.
struct VfromZ {
    a: ZIn,
}

impl Gen for VfromZ {
    fn type_name(&self) -> &'static str {
        "VfromZ"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        match self.a.onez(th)? {
            None => Ok(Pull::End),
            Some(z) => {
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.pushz(z);
                Ok(Pull::fill(out))
            }
        }
    }
}

/// Flatten one level of nesting.
struct Flat {
    outer: BothIn,
    inner: Option<BothIn>,
}

impl Gen for Flat {
    fn type_name(&self) -> &'static str {
        "Flat"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        loop {
            if let Some(inner) = &mut self.inner {
                match inner.one(th)? {
                    Some(x) => {
                        let mut out = Array::with_capacity(ItemKind::V, 1);
                        out.push(x);
                        return Ok(Pull::fill(out));
                    }
                    None => self.inner = None,
                }
            } else {
                match self.outer.one(th)? {
                    None => return Ok(Pull::End),
                    Some(item @ V::List(_)) => self.inner = Some(BothIn::new(item)),
                    Some(x) => {
                        let mut out = Array::with_capacity(ItemKind::V, 1);
                        out.push(x);
                        return Ok(Pull::fill(out));
                    }
                }
            }
        }
    }
}

/// Select from a packed source by an index sequence, wrapping out of
/// range indices.
struct Sel {
    src: Arc<List>,
    idx: BothIn,
}

impl Gen for Sel {
    fn type_name(&self) -> &'static str {
        "Sel"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        match self.idx.onei(th)? {
            None => Ok(Pull::End),
            Some(i) => {
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.push(self.src.wrap_at(i));
                Ok(Pull::fill(out))
            }
        }
    }
}

// --- prim bodies ---

type Prim = crate::fun::Prim;

fn ever_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(V::List(List::from_gen(ItemKind::V, false, Box::new(Ever { v }))))
}

fn everz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let z = th.pop_float("everz : value")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(ItemKind::Z, false, Box::new(Everz { z, block }))))
}

fn l_(th: &mut Thread, _: &Prim) -> Result<()> {
    if !th.top()?.is_vlist() {
        let v = th.pop()?;
        th.push(V::List(List::from_gen(ItemKind::V, false, Box::new(Ever { v }))))?;
    }
    Ok(())
}

fn l1_(th: &mut Thread, _: &Prim) -> Result<()> {
    if !th.top()?.is_vlist() {
        let v = th.pop()?;
        let mut array = Array::with_capacity(ItemKind::V, 1);
        array.push(v);
        th.push(V::List(List::packed(array)))?;
    }
    Ok(())
}

fn by_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop()?;
    let start = th.pop()?;
    th.push(V::List(List::from_gen(ItemKind::V, false, Box::new(By { start, step }))))
}

fn nby_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop()?;
    let start = th.pop()?;
    let n = th.pop_int("nby : n")?;
    th.push(V::List(List::from_gen(
        ItemKind::V,
        true,
        Box::new(NBy { start, step, n }),
    )))
}

fn byz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop_float("byz : step")?;
    let start = th.pop_float("byz : start")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        false,
        Box::new(Byz { start, step, block }),
    )))
}

fn nbyz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop_float("nbyz : step")?;
    let start = th.pop_float("nbyz : start")?;
    let n = th.pop_int("nbyz : n")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NByz { start, step, n, block }),
    )))
}

fn grow_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop()?;
    let start = th.pop()?;
    th.push(V::List(List::from_gen(ItemKind::V, false, Box::new(Grow { start, step }))))
}

fn ngrow_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop()?;
    let start = th.pop()?;
    let n = th.pop_int("ngrow : n")?;
    th.push(V::List(List::from_gen(
        ItemKind::V,
        true,
        Box::new(NGrow { start, step, n }),
    )))
}

fn growz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop_float("growz : step")?;
    let start = th.pop_float("growz : start")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        false,
        Box::new(Growz { start, step, block }),
    )))
}

fn ngrowz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let step = th.pop_float("ngrowz : step")?;
    let start = th.pop_float("ngrowz : start")?;
    let n = th.pop_int("ngrowz : n")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NGrowz { start, step, n, block }),
    )))
}

fn to_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("to : end")?;
    let start = th.pop_float("to : start")?;
    let step = if start < end { 1.0 } else { -1.0 };
    let n = ((end - start) * step) as i64 + 1;
    th.push(V::List(List::from_gen(
        ItemKind::V,
        true,
        Box::new(NBy {
            start: V::Real(start),
            step: V::Real(step),
            n,
        }),
    )))
}

fn toz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("toz : end")?;
    let start = th.pop_float("toz : start")?;
    let step = if start < end { 1.0 } else { -1.0 };
    let n = ((end - start) * step) as i64 + 1;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NByz { start, step, n, block }),
    )))
}

fn lindiv_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("lindiv : end")?;
    let start = th.pop_float("lindiv : start")?;
    let n = th.pop_int("lindiv : n")?;
    let step = (end - start) / (n - 1) as f64;
    th.push(V::List(List::from_gen(
        ItemKind::V,
        true,
        Box::new(NBy {
            start: V::Real(start),
            step: V::Real(step),
            n,
        }),
    )))
}

fn lindivz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("lindivz : end")?;
    let start = th.pop_float("lindivz : start")?;
    let n = th.pop_int("lindivz : n")?;
    let step = (end - start) / (n - 1) as f64;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NByz { start, step, n, block }),
    )))
}

fn expdiv_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("expdiv : end")?;
    let start = th.pop_float("expdiv : start")?;
    let n = th.pop_int("expdiv : n")?;
    let step = (end / start).powf(1.0 / (n - 1) as f64);
    th.push(V::List(List::from_gen(
        ItemKind::V,
        true,
        Box::new(NGrow {
            start: V::Real(start),
            step: V::Real(step),
            n,
        }),
    )))
}

fn expdivz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("expdivz : end")?;
    let start = th.pop_float("expdivz : start")?;
    let n = th.pop_int("expdivz : n")?;
    let step = (end / start).powf(1.0 / (n - 1) as f64);
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NGrowz { start, step, n, block }),
    )))
}

fn line_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("line : end")?;
    let start = th.pop_float("line : start")?;
    let dur = th.pop_float("line : dur")?;
    let n = (dur * th.rate.sample_rate + 0.5).floor().max(1.0);
    let step = (end - start) / n;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NByz {
            start,
            step,
            n: n as i64,
            block,
        }),
    )))
}

fn sgn_of(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn xline_(th: &mut Thread, _: &Prim) -> Result<()> {
    let end = th.pop_float("xline : end")?;
    let start = th.pop_float("xline : start")?;
    let dur = th.pop_float("xline : dur")?;
    let n = (dur * th.rate.sample_rate + 0.5).floor().max(1.0);
    let block = z_block_size(th);
    let gen: Box<dyn Gen> = if sgn_of(start) != sgn_of(end) || start == 0.0 || end == 0.0 {
        // crosses or touches zero: run the curve in cube-root space
        let s = sgn_of(start) * start.abs().powf(ONE_THIRD);
        let e = sgn_of(end) * end.abs().powf(ONE_THIRD);
        let step = (e - s) / n;
        Box::new(NCubicLinez {
            start: s,
            step,
            n: n as i64,
            block,
        })
    } else {
        let step = (end / start).powf(1.0 / n);
        Box::new(NGrowz {
            start,
            step,
            n: n as i64,
            block,
        })
    };
    th.push(V::List(List::from_gen(ItemKind::Z, true, gen)))
}

fn fib_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    let a = th.pop()?;
    th.push(V::List(List::from_gen(ItemKind::V, false, Box::new(Fib { a, b }))))
}

fn fibz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop_float("fibz : b")?;
    let a = th.pop_float("fibz : a")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        false,
        Box::new(Fibz { a, b, block }),
    )))
}

fn ord_(th: &mut Thread, _: &Prim) -> Result<()> {
    th.push(V::List(List::from_gen(
        ItemKind::V,
        false,
        Box::new(By {
            start: V::Real(1.0),
            step: V::Real(1.0),
        }),
    )))
}

fn negs_(th: &mut Thread, _: &Prim) -> Result<()> {
    th.push(V::List(List::from_gen(
        ItemKind::V,
        false,
        Box::new(By {
            start: V::Real(-1.0),
            step: V::Real(-1.0),
        }),
    )))
}

fn ninvz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("ninvz : n")?;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(NInvz {
            start: 1.0,
            n,
            block,
        }),
    )))
}

fn repeat_(th: &mut Thread, _: &Prim) -> Result<()> {
    let x = th.pop_float("X : n")?;
    let a = th.pop()?;
    if x <= 0.0 {
        return th.push(V::List(List::nil(ItemKind::V)));
    }
    let gen: Box<dyn Gen> = if x >= i64::MAX as f64 {
        if a.is_fun_or_prim() {
            Box::new(RepeatFun { f: a, i: 0, n: -1 })
        } else {
            Box::new(Ever { v: a })
        }
    } else {
        let n = (x + 0.5).floor() as i64;
        if a.is_fun_or_prim() {
            Box::new(RepeatFun { f: a, i: 0, n })
        } else {
            Box::new(Repeat { v: a, n })
        }
    };
    let finite = x < i64::MAX as f64;
    th.push(V::List(List::from_gen(ItemKind::V, finite, gen)))
}

fn repeatz_(th: &mut Thread, _: &Prim) -> Result<()> {
    let x = th.pop_float("XZ : n")?;
    let a = th.pop_float("XZ : value")?;
    let block = z_block_size(th);
    if x <= 0.0 {
        return th.push(V::List(List::nil(ItemKind::Z)));
    }
    if x >= i64::MAX as f64 {
        return th.push(V::List(List::from_gen(
            ItemKind::Z,
            false,
            Box::new(Everz { z: a, block }),
        )));
    }
    let n = (x + 0.5).floor() as i64;
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(Repeatz { z: a, n, block }),
    )))
}

fn mum_(th: &mut Thread, _: &Prim) -> Result<()> {
    let t = th.pop_float("mum : duration")?;
    let n = (th.rate.sample_rate * t + 0.5).floor() as i64;
    let block = z_block_size(th);
    if t.is_infinite() || (n <= 0 && t > 0.0) {
        th.push(V::List(List::from_gen(
            ItemKind::Z,
            false,
            Box::new(Everz { z: 0.0, block }),
        )))
    } else {
        th.push(V::List(List::from_gen(
            ItemKind::Z,
            true,
            Box::new(Silence { n, block }),
        )))
    }
}

fn append_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    let a = th.pop()?;
    let a = match a {
        V::List(list) => list,
        other => {
            let mut array = Array::with_capacity(ItemKind::V, 1);
            array.push(other);
            List::packed(array)
        }
    };
    let finite = a.finite() && b.is_finite();
    let kind = a.kind();
    th.push(V::List(List::from_gen(
        kind,
        finite,
        Box::new(Append {
            cur: Some(a),
            tail: b,
            kind,
        }),
    )))
}

fn cyc_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    let list = match v {
        V::List(list) => list,
        other => return th.push(other),
    };
    list.force(th)?;
    if list.is_end() {
        return th.push(V::List(list));
    }
    let kind = list.kind();
    th.push(V::List(List::from_gen(
        kind,
        false,
        Box::new(Cyc {
            first: list,
            cur: None,
        }),
    )))
}

fn ncyc_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("ncyc : n")?;
    let list = th.pop_list("ncyc : seq")?;
    list.force(th)?;
    if list.is_end() {
        return th.push(V::List(list));
    }
    if n <= 0 {
        return th.push(V::List(List::nil(list.kind())));
    }
    let kind = list.kind();
    th.push(V::List(List::from_gen(
        kind,
        true,
        Box::new(NCyc {
            cur: Some(list.clone()),
            first: list,
            n,
        }),
    )))
}

fn keep_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("N : n")?;
    let v = th.pop()?;
    match &v {
        V::List(list) if list.kind() == ItemKind::Z => {
            let block = z_block_size(th);
            th.push(V::List(List::from_gen(
                ItemKind::Z,
                true,
                Box::new(TakeZ {
                    a: ZIn::new(v.clone()),
                    n,
                    block,
                }),
            )))
        }
        V::List(_) => th.push(V::List(List::from_gen(
            ItemKind::V,
            true,
            Box::new(TakeV {
                a: VIn::new(v.clone()),
                n,
            }),
        ))),
        V::Real(z) => {
            let block = z_block_size(th);
            th.push(V::List(List::from_gen(
                ItemKind::Z,
                true,
                Box::new(Repeatz { z: *z, n, block }),
            )))
        }
        other => Err(wrong_type("N : in", "List or Real", other.type_name())),
    }
}

fn skip_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("N> : n")?;
    let v = th.pop()?;
    match &v {
        V::List(list) if list.kind() == ItemKind::Z => {
            let block = z_block_size(th);
            let finite = list.finite();
            th.push(V::List(List::from_gen(
                ItemKind::Z,
                finite,
                Box::new(TailZ {
                    a: ZIn::new(v.clone()),
                    skip: n,
                    block,
                }),
            )))
        }
        V::List(list) => {
            let finite = list.finite();
            th.push(V::List(List::from_gen(
                ItemKind::V,
                finite,
                Box::new(TailV {
                    a: VIn::new(v.clone()),
                    skip: n,
                }),
            )))
        }
        _ => th.push(v),
    }
}

fn take_t_(th: &mut Thread, _: &Prim) -> Result<()> {
    let t = th.pop_float("T : seconds")?;
    let v = th.pop_zin("T : signal")?;
    let n = (t * th.rate.sample_rate + 0.5).floor() as i64;
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        true,
        Box::new(TakeZ {
            a: ZIn::new(v),
            n,
            block,
        }),
    )))
}

fn skip_t_(th: &mut Thread, _: &Prim) -> Result<()> {
    let t = th.pop_float("T> : seconds")?;
    let v = th.pop_zin("T> : signal")?;
    let n = (t * th.rate.sample_rate + 0.5).floor() as i64;
    let finite = v.is_finite();
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        finite,
        Box::new(TailZ {
            a: ZIn::new(v),
            skip: n,
            block,
        }),
    )))
}

fn reverse_(th: &mut Thread, _: &Prim) -> Result<()> {
    let list = th.pop_list("reverse : s")?;
    if !list.finite() {
        return Err(indefinite_op("reverse"));
    }
    let packed = list.pack(th)?;
    if packed.is_end() {
        return th.push(V::List(packed));
    }
    let array = packed.array().ok_or(Error::Internal("reverse : unpacked".to_string()))?;
    let n = array.len();
    let mut out = Array::with_capacity(array.kind(), n);
    match &*array {
        Array::V(items) => {
            for item in items.iter().rev() {
                out.push(item.clone());
            }
        }
        Array::Z(items) => {
            for &z in items.iter().rev() {
                out.pushz(z);
            }
        }
    }
    th.push(V::List(List::packed(out)))
}

/// Append a reflected run of the packed input; `which` selects how much
/// of each end repeats.
fn mirrored(th: &mut Thread, which: usize) -> Result<()> {
    let list = th.pop_list("mirror : s")?;
    if !list.finite() {
        return Err(indefinite_op("mirror"));
    }
    let packed = list.pack(th)?;
    let array = packed.array().ok_or(Error::Internal("mirror : unpacked".to_string()))?;
    let n = array.len() as i64;
    let (count, from) = match which {
        // 1 2 3 --> 1 2 3 2
        0 => (n - 2, n - 2),
        // 1 2 3 --> 1 2 3 2 1
        1 => (n - 1, n - 2),
        // 1 2 3 --> 1 2 3 3 2 1
        _ => (n, n - 1),
    };
    if count <= 0 {
        return th.push(V::List(packed));
    }
    let mut out = Array::with_capacity(array.kind(), (n + count) as usize);
    out.append(&array);
    for i in 0..count {
        out.push(array.at(from - i));
    }
    th.push(V::List(List::packed(out)))
}

fn mirror_(th: &mut Thread, _: &Prim) -> Result<()> {
    mirrored(th, 0)
}

fn mirror1_(th: &mut Thread, _: &Prim) -> Result<()> {
    mirrored(th, 1)
}

fn mirror2_(th: &mut Thread, _: &Prim) -> Result<()> {
    mirrored(th, 2)
}

fn tuple_n(th: &mut Thread, n: usize) -> Result<()> {
    let items = th.pop_n(n)?;
    let mut array = Array::with_capacity(ItemKind::V, n);
    for item in items {
        array.push(item);
    }
    th.push(V::List(List::packed(array)))
}

fn tuple2_(th: &mut Thread, _: &Prim) -> Result<()> {
    tuple_n(th, 2)
}

fn tuple3_(th: &mut Thread, _: &Prim) -> Result<()> {
    tuple_n(th, 3)
}

fn tuple4_(th: &mut Thread, _: &Prim) -> Result<()> {
    tuple_n(th, 4)
}

fn untuple_n(th: &mut Thread, n: usize) -> Result<()> {
    let list = th.pop_list("un : s")?;
    let mut input = BothIn::new(V::List(list));
    for _ in 0..n {
        match input.one(th)? {
            Some(v) => th.push(v)?,
            None => return Err(Error::Failed(format!("un{n} : too few items"))),
        }
    }
    Ok(())
}

fn untuple2_(th: &mut Thread, _: &Prim) -> Result<()> {
    untuple_n(th, 2)
}

fn untuple3_(th: &mut Thread, _: &Prim) -> Result<()> {
    untuple_n(th, 3)
}

fn untuple4_(th: &mut Thread, _: &Prim) -> Result<()> {
    untuple_n(th, 4)
}

fn flat_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    let finite = v.is_finite();
    th.push(V::List(List::from_gen(
        ItemKind::V,
        finite,
        Box::new(Flat {
            outer: BothIn::new(v),
            inner: None,
        }),
    )))
}

fn sel_(th: &mut Thread, _: &Prim) -> Result<()> {
    let idx = th.pop()?;
    let src = th.pop_list("sel : in")?;
    let src = src.pack(th)?;
    let finite = idx.is_finite();
    th.push(V::List(List::from_gen(
        ItemKind::V,
        finite,
        Box::new(Sel {
            src,
            idx: BothIn::new(idx),
        }),
    )))
}

fn z_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    if v.is_zlist() || v.is_real() {
        return th.push(v);
    }
    let finite = v.is_finite();
    let block = z_block_size(th);
    th.push(V::List(List::from_gen(
        ItemKind::Z,
        finite,
        Box::new(ZfromV {
            a: BothIn::new(v),
            block,
        }),
    )))
}

fn v_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    if v.is_vlist() {
        return th.push(v);
    }
    let finite = v.is_finite();
    th.push(V::List(List::from_gen(
        ItemKind::V,
        finite,
        Box::new(VfromZ { a: ZIn::new(v) }),
    )))
}

fn pack_(th: &mut Thread, _: &Prim) -> Result<()> {
    let list = th.pop_list("pack : s")?;
    let packed = list.pack(th)?;
    th.push(V::List(packed))
}

fn len_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    let n = v.length(th)?;
    th.push(V::Real(n as f64))
}

fn bench_(th: &mut Thread, _: &Prim) -> Result<()> {
    let t = th.pop_float("bench : seconds")?;
    let v = th.pop_zin("bench : signal")?;
    let mut total = (t * th.rate.sample_rate + 0.5).floor() as usize;
    let mut zin = ZIn::new(v);
    let started = std::time::Instant::now();
    let mut pulled = 0usize;
    while total > 0 {
        let mut n = total.min(8192);
        let done = zin.bench(th, &mut n)?;
        pulled += n;
        total -= n.max(1).min(total);
        if done || n == 0 {
            break;
        }
    }
    let elapsed = started.elapsed();
    println!(
        "{} samples in {:.3} ms ({:.1}x realtime)",
        pulled,
        elapsed.as_secs_f64() * 1e3,
        pulled as f64 / th.rate.sample_rate / elapsed.as_secs_f64().max(1e-9)
    );
    Ok(())
}

pub fn install(t: &GTable) {
    def(t, "ever", 1, 1, ever_, "(value --> stream) an endless stream of one value.");
    def_mcx(t, "everz", 1, everz_, "(value --> signal) an endless signal of one sample value.");
    def(t, "L", 1, 1, l_, "(value --> stream) lift a value to an endless stream; lists pass through.");
    def(t, "L1", 1, 1, l1_, "(value --> stream) a one item stream; lists pass through.");
    def(t, "by", 2, 1, by_, "(start step --> stream) endless arithmetic series.");
    def(t, "nby", 3, 1, nby_, "(n start step --> stream) finite arithmetic series.");
    def_mcx(t, "byz", 2, byz_, "(start step --> signal) endless arithmetic series as a signal.");
    def_mcx(t, "nbyz", 3, nbyz_, "(n start step --> signal) finite arithmetic series as a signal.");
    def(t, "grow", 2, 1, grow_, "(start step --> stream) endless geometric series.");
    def(t, "ngrow", 3, 1, ngrow_, "(n start step --> stream) finite geometric series.");
    def_mcx(t, "growz", 2, growz_, "(start step --> signal) endless geometric series as a signal.");
    def_mcx(t, "ngrowz", 3, ngrowz_, "(n start step --> signal) finite geometric series as a signal.");
    def_mcx(t, "to", 2, to_, "(start end --> stream) integers from start to end inclusive.");
    def_mcx(t, "toz", 2, toz_, "(start end --> signal) integers from start to end as a signal.");
    def_mcx(t, "lindiv", 3, lindiv_, "(n start end --> stream) n values linearly dividing start to end.");
    def_mcx(t, "lindivz", 3, lindivz_, "(n start end --> signal) n samples linearly dividing start to end.");
    def_mcx(t, "expdiv", 3, expdiv_, "(n start end --> stream) n values exponentially dividing start to end.");
    def_mcx(t, "expdivz", 3, expdivz_, "(n start end --> signal) n samples exponentially dividing start to end.");
    def_mcx(t, "line", 3, line_, "(dur start end --> signal) linear ramp over dur seconds.");
    def_mcx(t, "xline", 3, xline_, "(dur start end --> signal) exponential ramp over dur seconds.");
    def(t, "fib", 2, 1, fib_, "(a b --> stream) generalized fibonacci series from two seeds.");
    def_mcx(t, "fibz", 2, fibz_, "(a b --> signal) fibonacci series as a signal.");
    def(t, "ord", 0, 1, ord_, "(--> stream) the ordinals 1 2 3 ...");
    def(t, "negs", 0, 1, negs_, "(--> stream) the negative integers -1 -2 -3 ...");
    def_mcx(t, "ninvz", 1, ninvz_, "(n --> signal) a finite signal of n reciprocals.");
    def_automap(t, "X", "ak", repeat_, "(value n --> stream) n copies of value. A fun is applied to a counter for each item.");
    def_mcx(t, "XZ", 2, repeatz_, "(value n --> signal) a signal with value repeated n times.");
    def_mcx(t, "mum", 1, mum_, "(t --> signal) t seconds of silence.");
    def(t, "$", 2, 1, append_, "(a b --> out) the items of a, then the items of b.");
    def(t, "$z", 2, 1, append_, "(signalA signalB --> signal) concatenation of two signals.");
    def(t, "cyc", 1, 1, cyc_, "(list --> out) cycle a list endlessly.");
    def(t, "ncyc", 2, 1, ncyc_, "(list n --> out) cycle a list n times.");
    def_automap(t, "N", "ak", keep_, "(list n --> list) the first n items of the input.");
    def_automap(t, "keep", "ak", keep_, "(list n --> list) the first n items of the input.");
    def_automap(t, "N>", "ak", skip_, "(list n --> list) skip the first n items of the input.");
    def_automap(t, "T", "zk", take_t_, "(signal t --> signal) the first t seconds of the input.");
    def_automap(t, "T>", "zk", skip_t_, "(signal t --> signal) skip the first t seconds of the input.");
    def(t, "reverse", 1, 1, reverse_, "(in --> out) a finite list reversed.");
    def(t, "mirror", 1, 1, mirror_, "(in --> out) append the reversed interior; cycles cleanly.");
    def(t, "mirror1", 1, 1, mirror1_, "(in --> out) palindrome of a finite list.");
    def(t, "mirror2", 1, 1, mirror2_, "(in --> out) the list followed by its full reversal.");
    def_automap(t, "2ples", "kk", tuple2_, "(a b --> [[a0 b0]..]) pair up two sequences.");
    def_automap(t, "3ples", "kkk", tuple3_, "(a b c --> seq) triple up three sequences.");
    def_automap(t, "4ples", "kkkk", tuple4_, "(a b c d --> seq) quadruple up four sequences.");
    def_no_each(t, "un2", 1, 2, untuple2_, "([a0 a1 ..] --> a0 a1) push two items of a sequence.");
    def_no_each(t, "un3", 1, 3, untuple3_, "([a0 a1 ..] --> a0 a1 a2) push three items of a sequence.");
    def_no_each(t, "un4", 1, 4, untuple4_, "([a0 a1 ..] --> a0 a1 a2 a3) push four items of a sequence.");
    def(t, "flat", 1, 1, flat_, "(in --> out) flatten one level of nesting.");
    def(t, "sel", 2, 1, sel_, "(in indices --> out) select items by index, wrapping.");
    def(t, "z", 1, 1, z_, "(stream --> signal) coerce a stream to a signal.");
    def(t, "v", 1, 1, v_, "(signal --> stream) coerce a signal to a stream.");
    def(t, "pack", 1, 1, pack_, "(in --> out) force a finite list into one packed node.");
    def(t, "len", 1, 1, len_, "(in --> n) length of a finite list.");
    def(t, "bench", 2, 0, bench_, "(signal t --> ) pull t seconds of a signal and report timing.");
}
