//! The tagged value: an unboxed real or a shared handle to a heap object.

use std::fmt::Write as _;
use std::sync::{Arc, Mutex};

use crate::array::ItemKind;
use crate::error::{wrong_type, Result};
use crate::form::Form;
use crate::fun::{Fun, Prim};
use crate::input::{VIn, ZIn};
use crate::list::List;
use crate::symbol::Str;
use crate::vm::Thread;
use crate::workspace::GForm;

/// A tagged value. Either a finite 64 bit float or a shared handle to one
/// of the object kinds. Cloning is cheap (a float copy or a reference
/// count bump).
#[derive(Debug, Clone)]
pub enum V {
    Real(f64),
    Str(Arc<Str>),
    List(Arc<List>),
    Fun(Arc<Fun>),
    Prim(Arc<Prim>),
    Form(Arc<Form>),
    GForm(Arc<GForm>),
    Ref(Arc<Ref>),
    ZRef(Arc<ZRef>),
    Plug(Arc<Plug>),
    ZPlug(Arc<ZPlug>),
    Each(Arc<EachOp>),
}

impl Default for V {
    fn default() -> Self {
        V::Real(0.0)
    }
}

impl From<f64> for V {
    fn from(f: f64) -> Self {
        V::Real(f)
    }
}

impl From<Arc<List>> for V {
    fn from(list: Arc<List>) -> Self {
        V::List(list)
    }
}

impl V {
    pub fn type_name(&self) -> &'static str {
        match self {
            V::Real(_) => "Real",
            V::Str(_) => "String",
            V::List(list) => {
                if list.kind() == ItemKind::V {
                    "VList"
                } else {
                    "ZList"
                }
            }
            V::Fun(_) => "Fun",
            V::Prim(_) => "Prim",
            V::Form(_) => "Form",
            V::GForm(_) => "GForm",
            V::Ref(_) => "Ref",
            V::ZRef(_) => "ZRef",
            V::Plug(_) => "Plug",
            V::ZPlug(_) => "ZPlug",
            V::Each(_) => "EachOp",
        }
    }

    #[inline]
    pub fn is_real(&self) -> bool {
        matches!(self, V::Real(_))
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        matches!(self, V::Real(f) if *f == 0.0)
    }

    pub fn is_true(&self) -> bool {
        match self {
            V::Real(f) => *f != 0.0,
            _ => true,
        }
    }

    #[inline]
    pub fn is_false(&self) -> bool {
        !self.is_true()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, V::List(_))
    }

    pub fn is_vlist(&self) -> bool {
        matches!(self, V::List(list) if list.kind() == ItemKind::V)
    }

    pub fn is_zlist(&self) -> bool {
        matches!(self, V::List(list) if list.kind() == ItemKind::Z)
    }

    /// Anything a signal input cursor accepts: a real (constant signal) or
    /// a signal list.
    pub fn is_zin(&self) -> bool {
        match self {
            V::Real(_) => true,
            V::List(list) => list.kind() == ItemKind::Z,
            V::ZRef(_) => true,
            _ => false,
        }
    }

    pub fn is_fun_or_prim(&self) -> bool {
        matches!(self, V::Fun(_) | V::Prim(_))
    }

    /// Strict numeric view. Refs are read through; anything else is a
    /// type error.
    pub fn as_float(&self, msg: &str) -> Result<f64> {
        match self {
            V::Real(f) => Ok(*f),
            V::Ref(r) => r.deref().as_float(msg),
            V::ZRef(r) => Ok(r.get()),
            _ => Err(wrong_type(msg, "Real", self.type_name())),
        }
    }

    pub fn as_int(&self, msg: &str) -> Result<i64> {
        Ok((self.as_float(msg)? + 0.5).floor() as i64)
    }

    /// Numeric view that never fails: non-numeric objects read as zero.
    pub fn to_float_lossy(&self) -> f64 {
        match self {
            V::Real(f) => *f,
            V::Ref(r) => r.deref().to_float_lossy(),
            V::ZRef(r) => r.get(),
            _ => 0.0,
        }
    }

    /// Whether this value, seen as a sequence, is guaranteed to
    /// terminate. A bare real is a constant sequence and thus indefinite.
    pub fn is_finite(&self) -> bool {
        match self {
            V::Real(_) => false,
            V::Str(_) => true,
            V::List(list) => list.finite(),
            V::Form(_) | V::GForm(_) => true,
            V::Ref(r) => r.deref().is_finite(),
            V::ZRef(_) => false,
            V::Each(e) => e.v.is_finite(),
            _ => false,
        }
    }

    /// Logical length: 1 for scalars, item count for lists and strings.
    pub fn length(&self, th: &mut Thread) -> Result<i64> {
        match self {
            V::List(list) => list.length(th),
            V::Str(s) => Ok(s.len() as i64),
            _ => Ok(1),
        }
    }

    /// Indexing with the zero policy. Scalars index as themselves at
    /// every position; lists must be packed.
    pub fn at(&self, i: i64) -> V {
        match self {
            V::List(list) => list.at(i),
            _ => self.clone(),
        }
    }

    pub fn wrap_at(&self, i: i64) -> V {
        match self {
            V::List(list) => list.wrap_at(i),
            _ => self.clone(),
        }
    }

    pub fn clip_at(&self, i: i64) -> V {
        match self {
            V::List(list) => list.clip_at(i),
            _ => self.clone(),
        }
    }

    pub fn fold_at(&self, i: i64) -> V {
        match self {
            V::List(list) => list.fold_at(i),
            _ => self.clone(),
        }
    }

    /// Read through a reference; identity for everything else.
    pub fn deref(&self) -> V {
        match self {
            V::Ref(r) => r.deref(),
            V::ZRef(r) => V::Real(r.get()),
            _ => self.clone(),
        }
    }

    /// Force progress on a held sequence by `n` items. Used by feedback
    /// consumers to keep a ref-held list moving.
    pub fn chase(&self, th: &mut Thread, n: i64) -> Result<V> {
        match self {
            V::Ref(r) => {
                let inner = r.deref().chase(th, n)?;
                r.set(inner);
                Ok(self.clone())
            }
            V::ZRef(r) => Ok(V::Real(r.get())),
            V::List(list) => Ok(list.chase(th, n)?.map(V::List).unwrap_or(self.clone())),
            V::Form(form) => Ok(V::Form(form.chase(th, n)?)),
            _ => Ok(self.clone()),
        }
    }

    /// Identity: same object, or the same real.
    pub fn identical(&self, other: &V) -> bool {
        match (self, other) {
            (V::Real(a), V::Real(b)) => a == b,
            (V::Str(a), V::Str(b)) => Arc::ptr_eq(a, b),
            (V::List(a), V::List(b)) => Arc::ptr_eq(a, b),
            (V::Fun(a), V::Fun(b)) => Arc::ptr_eq(a, b),
            (V::Prim(a), V::Prim(b)) => Arc::ptr_eq(a, b),
            (V::Form(a), V::Form(b)) => Arc::ptr_eq(a, b),
            (V::GForm(a), V::GForm(b)) => Arc::ptr_eq(a, b),
            (V::Ref(a), V::Ref(b)) => Arc::ptr_eq(a, b),
            (V::ZRef(a), V::ZRef(b)) => Arc::ptr_eq(a, b),
            (V::Plug(a), V::Plug(b)) => Arc::ptr_eq(a, b),
            (V::ZPlug(a), V::ZPlug(b)) => Arc::ptr_eq(a, b),
            (V::Each(a), V::Each(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Structural equality. Strings compare by content, finite lists by
    /// element sequence, refs by the held value; other objects by
    /// identity.
    pub fn equals(&self, th: &mut Thread, other: &V) -> Result<bool> {
        if self.identical(other) {
            return Ok(true);
        }
        match (self, other) {
            (V::Real(a), V::Real(b)) => Ok(a == b),
            (V::Str(a), V::Str(b)) => Ok(a == b),
            (V::List(a), V::List(b)) => List::equals(a, b, th),
            (V::Ref(a), V::Ref(b)) => {
                let x = a.deref();
                let y = b.deref();
                x.equals(th, &y)
            }
            (V::ZRef(a), V::ZRef(b)) => Ok(a.get() == b.get()),
            (V::Form(a), V::Form(b)) => Form::equals(a, b, th),
            _ => Ok(false),
        }
    }

    /// Field fetch. Errors with `not_found` on a miss.
    pub fn must_get(&self, th: &mut Thread, key: &V) -> Result<V> {
        match self {
            V::Form(form) => form.must_get(key),
            V::GForm(ws) => ws.must_get(key),
            _ => Err(wrong_type("get : record", "Form", self.type_name())),
        }
    }

    pub fn get(&self, _th: &mut Thread, key: &V) -> Option<V> {
        match self {
            V::Form(form) => form.get(key),
            V::GForm(ws) => ws.get(key),
            _ => None,
        }
    }

    /// `,key` : field fetch without sending.
    pub fn comma(&self, th: &mut Thread, key: &V) -> Result<V> {
        self.must_get(th, key)
    }

    /// `.key` : field fetch, then message send: a fun or prim found at
    /// the key is applied with this value as its single argument.
    pub fn dot(&self, th: &mut Thread, key: &V) -> Result<V> {
        let found = self.must_get(th, key)?;
        found.msg_send(th, self)
    }

    /// Apply a fetched member to its receiver.
    pub fn msg_send(&self, th: &mut Thread, receiver: &V) -> Result<V> {
        if self.is_fun_or_prim() {
            th.push(receiver.clone())?;
            self.apply(th)?;
            th.pop()
        } else {
            Ok(self.clone())
        }
    }

    /// How this value behaves when it appears as an instruction: funs and
    /// prims execute, refs read through, everything else pushes itself.
    pub fn apply(&self, th: &mut Thread) -> Result<()> {
        match self {
            V::Fun(_) | V::Prim(_) => crate::automap::apply_call(th, self),
            V::Ref(r) => th.push(r.deref()),
            V::ZRef(r) => th.push(V::Real(r.get())),
            _ => th.push(self.clone()),
        }
    }

    /// Opt this value out of multichannel expansion.
    pub fn set_no_each(&self) {
        match self {
            V::List(list) => list.set_no_each(),
            V::Form(form) => form.set_no_each(),
            _ => {}
        }
    }

    pub fn no_each(&self) -> bool {
        match self {
            V::List(list) => list.no_each(),
            V::Form(form) => form.no_each(),
            _ => false,
        }
    }

    pub fn takes(&self) -> usize {
        match self {
            V::Fun(f) => f.num_args(),
            V::Prim(p) => p.takes as usize,
            _ => 0,
        }
    }

    pub fn leaves(&self) -> usize {
        match self {
            V::Fun(f) => f.leaves(),
            V::Prim(p) => p.leaves as usize,
            _ => 1,
        }
    }

    /// The declared automap mask, if any.
    pub fn automap_mask(&self) -> Option<&'static str> {
        match self {
            V::Prim(p) => p.mask,
            _ => None,
        }
    }

    /// Print honouring the thread's depth, length and total item limits.
    pub fn print(&self, th: &mut Thread, out: &mut String, depth: usize) -> Result<()> {
        let mut budget = th.vm.print_total_items as i64;
        self.print_limited(th, out, depth, &mut budget)
    }

    pub(crate) fn print_limited(
        &self,
        th: &mut Thread,
        out: &mut String,
        depth: usize,
        budget: &mut i64,
    ) -> Result<()> {
        if depth > th.vm.print_depth {
            out.push_str("...");
            return Ok(());
        }
        match self {
            V::Real(f) => {
                let _ = write!(out, "{}", format_real(*f));
            }
            V::Str(s) => {
                let _ = write!(out, "\"{}\"", s.as_str());
            }
            V::List(list) => list.print(th, out, depth, budget)?,
            V::Fun(_) => out.push_str("aFun"),
            V::Prim(p) => {
                let _ = write!(out, "{}", p.name);
            }
            V::Form(form) => form.print(th, out, depth, budget)?,
            V::GForm(_) => out.push_str("aWorkspace"),
            V::Ref(r) => {
                out.push_str("(ref ");
                r.deref().print_limited(th, out, depth + 1, budget)?;
                out.push(')');
            }
            V::ZRef(r) => {
                let _ = write!(out, "(zref {})", format_real(r.get()));
            }
            V::Plug(_) => out.push_str("aPlug"),
            V::ZPlug(_) => out.push_str("aZPlug"),
            V::Each(e) => {
                e.v.print_limited(th, out, depth, budget)?;
                for _ in 0..e.depth {
                    out.push('@');
                }
            }
        }
        Ok(())
    }
}

/// Format a real the short way: integers without a point, otherwise
/// shortest round-trip.
pub fn format_real(f: f64) -> String {
    if f == f.trunc() && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        format!("{}", f)
    }
}

/// A thread-safe mutable holder of one value. The sanctioned indirection
/// for feedback: a ref does not co-own the graph that reads it.
#[derive(Debug)]
pub struct Ref {
    cell: Mutex<V>,
}

impl Ref {
    pub fn new(v: V) -> Self {
        Ref {
            cell: Mutex::new(v),
        }
    }

    pub fn deref(&self) -> V {
        self.cell.lock().unwrap().clone()
    }

    pub fn set(&self, v: V) {
        *self.cell.lock().unwrap() = v;
    }
}

/// A mutable holder of one sample.
#[derive(Debug)]
pub struct ZRef {
    cell: Mutex<f64>,
}

impl ZRef {
    pub fn new(z: f64) -> Self {
        ZRef {
            cell: Mutex::new(z),
        }
    }

    pub fn get(&self) -> f64 {
        *self.cell.lock().unwrap()
    }

    pub fn set(&self, z: f64) {
        *self.cell.lock().unwrap() = z;
    }
}

/// A mutable stream input with a change counter, so feedback consumers
/// can detect replugging at block boundaries.
#[derive(Debug)]
pub struct Plug {
    cell: Mutex<(VIn, u32)>,
}

impl Plug {
    pub fn new(v: V) -> Self {
        Plug {
            cell: Mutex::new((VIn::new(v), 0)),
        }
    }

    pub fn set(&self, v: V) {
        let mut cell = self.cell.lock().unwrap();
        cell.0 = VIn::new(v);
        cell.1 = cell.1.wrapping_add(1);
    }

    pub fn store(&self, cursor: VIn, change_count: u32) {
        let mut cell = self.cell.lock().unwrap();
        // a newer set wins over a consumer writing its position back
        if cell.1 == change_count {
            cell.0 = cursor;
        }
    }

    pub fn load(&self) -> (VIn, u32) {
        let cell = self.cell.lock().unwrap();
        (cell.0.clone(), cell.1)
    }
}

/// A mutable signal input with a change counter.
#[derive(Debug)]
pub struct ZPlug {
    cell: Mutex<(ZIn, u32)>,
}

impl ZPlug {
    pub fn new(v: V) -> Self {
        ZPlug {
            cell: Mutex::new((ZIn::new(v), 0)),
        }
    }

    pub fn set(&self, v: V) {
        let mut cell = self.cell.lock().unwrap();
        cell.0 = ZIn::new(v);
        cell.1 = cell.1.wrapping_add(1);
    }

    pub fn store(&self, cursor: ZIn, change_count: u32) {
        let mut cell = self.cell.lock().unwrap();
        if cell.1 == change_count {
            cell.0 = cursor;
        }
    }

    pub fn load(&self) -> (ZIn, u32) {
        let cell = self.cell.lock().unwrap();
        (cell.0.clone(), cell.1)
    }
}

/// A value marked for per-element application: each `@` adds one level of
/// mapping when the surrounding call is invoked.
#[derive(Debug)]
pub struct EachOp {
    pub v: V,
    pub depth: u32,
}

impl EachOp {
    pub fn new(v: V, depth: u32) -> Self {
        EachOp { v, depth }
    }
}
