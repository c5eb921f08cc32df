//! Consumer-side cursors over lists.
//!
//! A cursor walks a chain, forcing pending nodes as needed, and exposes
//! contiguous runs to its caller. A cursor over a scalar produces that
//! constant indefinitely.

use std::sync::Arc;

use crate::array::{Array, ItemKind};
use crate::error::Result;
use crate::list::List;
use crate::value::V;
use crate::vm::Thread;

/// A contiguous run of values available from a cursor.
pub enum VRun<'a> {
    Done,
    /// A constant input: the same value at every position.
    Constant(V),
    Items(&'a [V]),
}

/// A contiguous run of samples available from a cursor.
pub enum ZRun<'a> {
    Done,
    Constant(f64),
    Items(&'a [f64]),
}

/// Cursor over a stream (value list), or a constant value.
#[derive(Debug, Clone)]
pub struct VIn {
    node: Option<Arc<List>>,
    cur: Option<Arc<Array>>,
    offset: usize,
    constant: Option<V>,
    done: bool,
}

impl VIn {
    pub fn new(v: V) -> Self {
        match v {
            V::List(list) if list.kind() == ItemKind::V => VIn {
                node: Some(list),
                cur: None,
                offset: 0,
                constant: None,
                done: false,
            },
            other => VIn {
                node: None,
                cur: None,
                offset: 0,
                constant: Some(other),
                done: false,
            },
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn done(&self) -> bool {
        self.done
    }

    /// Position the cursor on available data. Returns true at end.
    fn ensure(&mut self, th: &mut Thread) -> Result<bool> {
        if self.done {
            return Ok(true);
        }
        if self.constant.is_some() {
            return Ok(false);
        }
        loop {
            if let Some(cur) = &self.cur {
                if self.offset < cur.len() {
                    return Ok(false);
                }
                let next = self.node.as_ref().and_then(|n| n.next());
                match next {
                    Some(tail) => {
                        self.node = Some(tail);
                        self.cur = None;
                        self.offset = 0;
                    }
                    None => {
                        self.node = None;
                        self.cur = None;
                        self.done = true;
                        return Ok(true);
                    }
                }
            } else {
                match self.node.clone() {
                    Some(node) => {
                        let (array, _) = node.forced(th)?;
                        self.cur = Some(array);
                        self.offset = 0;
                    }
                    None => {
                        self.done = true;
                        return Ok(true);
                    }
                }
            }
        }
    }

    /// The next run of up to `want` items.
    pub fn run(&mut self, th: &mut Thread, want: usize) -> Result<VRun<'_>> {
        if self.ensure(th)? {
            return Ok(VRun::Done);
        }
        if let Some(c) = &self.constant {
            return Ok(VRun::Constant(c.clone()));
        }
        let cur = self.cur.as_ref().unwrap();
        let n = (cur.len() - self.offset).min(want);
        Ok(VRun::Items(&cur.v()[self.offset..self.offset + n]))
    }

    /// Consume `n` items of the current run. No-op on constants.
    pub fn advance(&mut self, n: usize) {
        if self.constant.is_none() {
            self.offset += n;
        }
    }

    /// Pull a single value. `None` at end; constants never end.
    pub fn one(&mut self, th: &mut Thread) -> Result<Option<V>> {
        if self.ensure(th)? {
            return Ok(None);
        }
        if let Some(c) = &self.constant {
            return Ok(Some(c.clone()));
        }
        let cur = self.cur.as_ref().unwrap();
        let item = cur.v()[self.offset].clone();
        self.offset += 1;
        Ok(Some(item))
    }
}

/// Cursor over a signal (sample list), or a constant sample.
#[derive(Debug, Clone)]
pub struct ZIn {
    node: Option<Arc<List>>,
    cur: Option<Arc<Array>>,
    offset: usize,
    constant: Option<f64>,
    done: bool,
}

impl ZIn {
    pub fn new(v: V) -> Self {
        match v {
            V::List(list) if list.kind() == ItemKind::Z => ZIn {
                node: Some(list),
                cur: None,
                offset: 0,
                constant: None,
                done: false,
            },
            other => ZIn {
                node: None,
                cur: None,
                offset: 0,
                constant: Some(other.to_float_lossy()),
                done: false,
            },
        }
    }

    pub fn constant(z: f64) -> Self {
        ZIn {
            node: None,
            cur: None,
            offset: 0,
            constant: Some(z),
            done: false,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    pub fn done(&self) -> bool {
        self.done
    }

    fn ensure(&mut self, th: &mut Thread) -> Result<bool> {
        if self.done {
            return Ok(true);
        }
        if self.constant.is_some() {
            return Ok(false);
        }
        loop {
            if let Some(cur) = &self.cur {
                if self.offset < cur.len() {
                    return Ok(false);
                }
                let next = self.node.as_ref().and_then(|n| n.next());
                match next {
                    Some(tail) => {
                        self.node = Some(tail);
                        self.cur = None;
                        self.offset = 0;
                    }
                    None => {
                        self.node = None;
                        self.cur = None;
                        self.done = true;
                        return Ok(true);
                    }
                }
            } else {
                match self.node.clone() {
                    Some(node) => {
                        let (array, _) = node.forced(th)?;
                        self.cur = Some(array);
                        self.offset = 0;
                    }
                    None => {
                        self.done = true;
                        return Ok(true);
                    }
                }
            }
        }
    }

    pub fn run(&mut self, th: &mut Thread, want: usize) -> Result<ZRun<'_>> {
        if self.ensure(th)? {
            return Ok(ZRun::Done);
        }
        if let Some(c) = self.constant {
            return Ok(ZRun::Constant(c));
        }
        let cur = self.cur.as_ref().unwrap();
        let n = (cur.len() - self.offset).min(want);
        Ok(ZRun::Items(&cur.z()[self.offset..self.offset + n]))
    }

    pub fn advance(&mut self, n: usize) {
        if self.constant.is_none() {
            self.offset += n;
        }
    }

    /// Pull one sample.
    pub fn onez(&mut self, th: &mut Thread) -> Result<Option<f64>> {
        if self.ensure(th)? {
            return Ok(None);
        }
        if let Some(c) = self.constant {
            return Ok(Some(c));
        }
        let cur = self.cur.as_ref().unwrap();
        let z = cur.z()[self.offset];
        self.offset += 1;
        Ok(Some(z))
    }

    /// Read the next sample without consuming it.
    pub fn peek(&mut self, th: &mut Thread) -> Result<Option<f64>> {
        if self.ensure(th)? {
            return Ok(None);
        }
        if let Some(c) = self.constant {
            return Ok(Some(c));
        }
        Ok(Some(self.cur.as_ref().unwrap().z()[self.offset]))
    }

    /// Copy up to `*n` samples into `out` at `stride`. `*n` is set to the
    /// count actually written. Returns true when the stream has ended.
    pub fn fill(&mut self, th: &mut Thread, n: &mut usize, out: &mut [f64], stride: usize) -> Result<bool> {
        let want = *n;
        let mut filled = 0;
        while filled < want {
            let (k, constant) = match self.run(th, want - filled)? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    let mut j = filled * stride;
                    for _ in filled..want {
                        out[j] = c;
                        j += stride;
                    }
                    (want - filled, true)
                }
                ZRun::Items(items) => {
                    let mut j = filled * stride;
                    for &x in items {
                        out[j] = x;
                        j += stride;
                    }
                    (items.len(), false)
                }
            };
            if !constant {
                self.advance(k);
            }
            filled += k;
        }
        *n = filled;
        Ok(self.done)
    }

    /// `fill` into a 32 bit buffer, for host audio callbacks.
    pub fn fill_f32(&mut self, th: &mut Thread, n: &mut usize, out: &mut [f32], stride: usize) -> Result<bool> {
        let want = *n;
        let mut filled = 0;
        while filled < want {
            let (k, constant) = match self.run(th, want - filled)? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    let mut j = filled * stride;
                    for _ in filled..want {
                        out[j] = c as f32;
                        j += stride;
                    }
                    (want - filled, true)
                }
                ZRun::Items(items) => {
                    let mut j = filled * stride;
                    for &x in items {
                        out[j] = x as f32;
                        j += stride;
                    }
                    (items.len(), false)
                }
            };
            if !constant {
                self.advance(k);
            }
            filled += k;
        }
        *n = filled;
        Ok(self.done)
    }

    /// Add up to `*n` samples into `out`.
    pub fn mix(&mut self, th: &mut Thread, n: &mut usize, out: &mut [f64]) -> Result<bool> {
        let want = *n;
        let mut filled = 0;
        while filled < want {
            let (k, constant) = match self.run(th, want - filled)? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    for slot in out.iter_mut().take(want).skip(filled) {
                        *slot += c;
                    }
                    (want - filled, true)
                }
                ZRun::Items(items) => {
                    for (slot, &x) in out[filled..].iter_mut().zip(items) {
                        *slot += x;
                    }
                    (items.len(), false)
                }
            };
            if !constant {
                self.advance(k);
            }
            filled += k;
        }
        *n = filled;
        Ok(self.done)
    }

    /// Fill exactly `n` samples, zero padding past the end of the stream.
    /// Returns true if the stream ended inside this segment.
    pub fn fill_segment(&mut self, th: &mut Thread, n: usize, out: &mut [f64]) -> Result<bool> {
        let mut got = n;
        let ended = self.fill(th, &mut got, out, 1)?;
        for slot in out.iter_mut().take(n).skip(got) {
            *slot = 0.0;
        }
        Ok(ended || got < n)
    }

    /// Skip forward without producing output. Constants skip for free.
    pub fn hop(&mut self, th: &mut Thread, frames: usize) -> Result<bool> {
        if self.constant.is_some() {
            return Ok(false);
        }
        let mut remaining = frames;
        while remaining > 0 {
            let k = match self.run(th, remaining)? {
                ZRun::Done => return Ok(true),
                ZRun::Constant(_) => remaining,
                ZRun::Items(items) => items.len(),
            };
            self.advance(k);
            remaining -= k;
        }
        Ok(self.done)
    }

    /// Consume up to `*n` samples without copying; the benchmark sink.
    pub fn bench(&mut self, th: &mut Thread, n: &mut usize) -> Result<bool> {
        let want = *n;
        let mut consumed = 0;
        while consumed < want {
            let k = match self.run(th, want - consumed)? {
                ZRun::Done => break,
                ZRun::Constant(_) => want - consumed,
                ZRun::Items(items) => items.len(),
            };
            self.advance(k);
            consumed += k;
        }
        *n = consumed;
        Ok(self.done)
    }
}

/// Polymorphic cursor: walks a list of either kind, or repeats a
/// constant. Used where the carrier kind is not statically known.
#[derive(Debug, Clone)]
pub struct BothIn {
    node: Option<Arc<List>>,
    cur: Option<Arc<Array>>,
    offset: usize,
    constant: Option<V>,
    done: bool,
}

impl BothIn {
    pub fn new(v: V) -> Self {
        match v {
            V::List(list) => BothIn {
                node: Some(list),
                cur: None,
                offset: 0,
                constant: None,
                done: false,
            },
            other => BothIn {
                node: None,
                cur: None,
                offset: 0,
                constant: Some(other),
                done: false,
            },
        }
    }

    /// Like `new` but a non-list constant is delivered exactly once.
    /// Used by ops that treat a scalar as a one-item sequence.
    pub fn new_once(v: V) -> Self {
        match v {
            V::List(_) => BothIn::new(v),
            other => {
                let mut array = Array::new(ItemKind::V);
                array.push(other);
                BothIn::new(V::List(List::packed(array)))
            }
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    fn ensure(&mut self, th: &mut Thread) -> Result<bool> {
        if self.done {
            return Ok(true);
        }
        if self.constant.is_some() {
            return Ok(false);
        }
        loop {
            if let Some(cur) = &self.cur {
                if self.offset < cur.len() {
                    return Ok(false);
                }
                let next = self.node.as_ref().and_then(|n| n.next());
                match next {
                    Some(tail) => {
                        self.node = Some(tail);
                        self.cur = None;
                        self.offset = 0;
                    }
                    None => {
                        self.node = None;
                        self.cur = None;
                        self.done = true;
                        return Ok(true);
                    }
                }
            } else {
                match self.node.clone() {
                    Some(node) => {
                        let (array, _) = node.forced(th)?;
                        self.cur = Some(array);
                        self.offset = 0;
                    }
                    None => {
                        self.done = true;
                        return Ok(true);
                    }
                }
            }
        }
    }

    pub fn one(&mut self, th: &mut Thread) -> Result<Option<V>> {
        if self.ensure(th)? {
            return Ok(None);
        }
        if let Some(c) = &self.constant {
            return Ok(Some(c.clone()));
        }
        let cur = self.cur.as_ref().unwrap();
        let item = cur.at(self.offset as i64);
        self.offset += 1;
        Ok(Some(item))
    }

    pub fn onez(&mut self, th: &mut Thread) -> Result<Option<f64>> {
        Ok(self.one(th)?.map(|v| v.to_float_lossy()))
    }

    pub fn onei(&mut self, th: &mut Thread) -> Result<Option<i64>> {
        Ok(self.onez(th)?.map(|z| (z + 0.5).floor() as i64))
    }
}

/// Split a playback or recording input into per-channel signal cursors:
/// a signal (or constant) is one channel, a finite stream of signals is
/// one channel per element.
pub fn channel_cursors(th: &mut Thread, v: V, msg: &str) -> Result<Vec<ZIn>> {
    match v {
        V::Real(_) => Ok(vec![ZIn::new(v)]),
        V::List(ref list) if list.kind() == ItemKind::Z => Ok(vec![ZIn::new(v)]),
        V::List(list) => {
            if !list.finite() {
                return Err(crate::error::indefinite_op(msg));
            }
            let packed = list
                .pack_limit(th, crate::MAX_CHANNELS)?
                .ok_or_else(|| crate::error::Error::Failed(format!("{msg} : too many channels")))?;
            let array = packed.array().unwrap_or_else(|| Arc::new(Array::new(ItemKind::V)));
            let mut out = Vec::with_capacity(array.len());
            for i in 0..array.len() as i64 {
                let item = array.at(i);
                if !item.is_zin() {
                    return Err(crate::error::wrong_type(msg, "ZList", item.type_name()));
                }
                out.push(ZIn::new(item));
            }
            Ok(out)
        }
        other => Err(crate::error::wrong_type(msg, "List or Real", other.type_name())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::Thread;

    fn packed_z(items: &[f64]) -> V {
        let mut a = Array::new(ItemKind::Z);
        for &x in items {
            a.pushz(x);
        }
        V::List(List::packed(a))
    }

    #[test]
    fn constant_cursor_never_ends() {
        let mut th = Thread::for_tests();
        let mut zin = ZIn::new(V::Real(3.5));
        for _ in 0..100 {
            assert_eq!(zin.onez(&mut th).unwrap(), Some(3.5));
        }
        assert!(!zin.done());
    }

    #[test]
    fn fill_reports_short_read_and_end() {
        let mut th = Thread::for_tests();
        let mut zin = ZIn::new(packed_z(&[1.0, 2.0, 3.0]));
        let mut out = [0.0f64; 8];
        let mut n = 8;
        let done = zin.fill(&mut th, &mut n, &mut out, 1).unwrap();
        assert!(done);
        assert_eq!(n, 3);
        assert_eq!(&out[..3], &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn fill_segment_zero_pads() {
        let mut th = Thread::for_tests();
        let mut zin = ZIn::new(packed_z(&[5.0]));
        let mut out = [9.0f64; 4];
        let ended = zin.fill_segment(&mut th, 4, &mut out).unwrap();
        assert!(ended);
        assert_eq!(out, [5.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn strided_fill_interleaves() {
        let mut th = Thread::for_tests();
        let mut zin = ZIn::new(packed_z(&[1.0, 2.0]));
        let mut out = [0.0f64; 4];
        let mut n = 2;
        zin.fill(&mut th, &mut n, &mut out, 2).unwrap();
        assert_eq!(out, [1.0, 0.0, 2.0, 0.0]);
    }
}
