//! Scalar math operators and their lowering over lists.
//!
//! A binary operation on two signals pulls both inputs in lockstep and
//! ends with the shorter one; a scalar operand strides at zero cost.
//! Stream operands lower pointwise and recursively, so nested lists
//! combine element by element.

use std::sync::Arc;

use crate::array::{Array, ItemKind};
use crate::error::{indefinite_op, wrong_type, Error, Result};
use crate::gen::{z_block_size, Gen, Pull};
use crate::input::{BothIn, VIn, ZIn, ZRun};
use crate::list::List;
use crate::symbol::Str;
use crate::value::V;
use crate::vm::{def, Thread};
use crate::workspace::GTable;

/// A pointwise operation of one argument.
pub struct UnaryOp {
    pub name: &'static str,
    pub f: fn(f64) -> f64,
}

/// A pointwise operation of two arguments, with an optional meaning for
/// string operands.
pub struct BinaryOp {
    pub name: &'static str,
    pub f: fn(f64, f64) -> f64,
    pub string_op: Option<fn(&Str, &Str) -> V>,
}

fn sgn(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn floor_div(a: f64, b: f64) -> f64 {
    (a / b).floor()
}

fn floor_mod(a: f64, b: f64) -> f64 {
    a - (a / b).floor() * b
}

fn concat(a: &Str, b: &Str) -> V {
    let mut s = String::with_capacity(a.len() + b.len());
    s.push_str(a.as_str());
    s.push_str(b.as_str());
    V::Str(Arc::new(Str::from_string(s)))
}

pub static OP_NEG: UnaryOp = UnaryOp { name: "neg", f: |a| -a };
pub static OP_ABS: UnaryOp = UnaryOp { name: "abs", f: f64::abs };
pub static OP_SGN: UnaryOp = UnaryOp { name: "sgn", f: sgn };
pub static OP_RECIP: UnaryOp = UnaryOp { name: "recip", f: |a| 1.0 / a };
pub static OP_SQ: UnaryOp = UnaryOp { name: "sq", f: |a| a * a };
pub static OP_SQRT: UnaryOp = UnaryOp { name: "sqrt", f: f64::sqrt };
pub static OP_CB: UnaryOp = UnaryOp { name: "cb", f: |a| a * a * a };
pub static OP_CBRT: UnaryOp = UnaryOp { name: "cbrt", f: f64::cbrt };
pub static OP_EXP: UnaryOp = UnaryOp { name: "exp", f: f64::exp };
pub static OP_LOG: UnaryOp = UnaryOp { name: "log", f: f64::ln };
pub static OP_LOG2: UnaryOp = UnaryOp { name: "log2", f: f64::log2 };
pub static OP_LOG10: UnaryOp = UnaryOp { name: "log10", f: f64::log10 };
pub static OP_SIN: UnaryOp = UnaryOp { name: "sin", f: f64::sin };
pub static OP_COS: UnaryOp = UnaryOp { name: "cos", f: f64::cos };
pub static OP_TAN: UnaryOp = UnaryOp { name: "tan", f: f64::tan };
pub static OP_ASIN: UnaryOp = UnaryOp { name: "asin", f: f64::asin };
pub static OP_ACOS: UnaryOp = UnaryOp { name: "acos", f: f64::acos };
pub static OP_ATAN: UnaryOp = UnaryOp { name: "atan", f: f64::atan };
pub static OP_SINH: UnaryOp = UnaryOp { name: "sinh", f: f64::sinh };
pub static OP_COSH: UnaryOp = UnaryOp { name: "cosh", f: f64::cosh };
pub static OP_TANH: UnaryOp = UnaryOp { name: "tanh", f: f64::tanh };
pub static OP_FLOOR: UnaryOp = UnaryOp { name: "floor", f: f64::floor };
pub static OP_CEIL: UnaryOp = UnaryOp { name: "ceil", f: f64::ceil };
pub static OP_ROUND: UnaryOp = UnaryOp { name: "round", f: f64::round };
pub static OP_FRAC: UnaryOp = UnaryOp { name: "frac", f: |a| a - a.floor() };
pub static OP_DISTORT: UnaryOp = UnaryOp { name: "distort", f: |a| a / (1.0 + a.abs()) };
pub static OP_SOFTCLIP: UnaryOp = UnaryOp {
    name: "softclip",
    f: |a| {
        if a.abs() <= 1.0 {
            a * (1.5 - 0.5 * a * a)
        } else {
            sgn(a)
        }
    },
};

pub static OP_ADD: BinaryOp = BinaryOp {
    name: "+",
    f: |a, b| a + b,
    string_op: Some(concat),
};
pub static OP_SUB: BinaryOp = BinaryOp { name: "-", f: |a, b| a - b, string_op: None };
pub static OP_MUL: BinaryOp = BinaryOp { name: "*", f: |a, b| a * b, string_op: None };
pub static OP_DIV: BinaryOp = BinaryOp { name: "/", f: |a, b| a / b, string_op: None };
pub static OP_IDIV: BinaryOp = BinaryOp { name: "div", f: floor_div, string_op: None };
pub static OP_MOD: BinaryOp = BinaryOp { name: "%", f: floor_mod, string_op: None };
pub static OP_POW: BinaryOp = BinaryOp { name: "**", f: f64::powf, string_op: None };
pub static OP_MIN: BinaryOp = BinaryOp { name: "min", f: f64::min, string_op: None };
pub static OP_MAX: BinaryOp = BinaryOp { name: "max", f: f64::max, string_op: None };
pub static OP_ATAN2: BinaryOp = BinaryOp { name: "atan2", f: f64::atan2, string_op: None };
pub static OP_HYPOT: BinaryOp = BinaryOp { name: "hypot", f: f64::hypot, string_op: None };
pub static OP_AVG: BinaryOp = BinaryOp { name: "avg2", f: |a, b| 0.5 * (a + b), string_op: None };
pub static OP_ABSDIF: BinaryOp = BinaryOp { name: "absdif", f: |a, b| (a - b).abs(), string_op: None };
pub static OP_LT: BinaryOp = BinaryOp { name: "<", f: |a, b| (a < b) as i64 as f64, string_op: None };
pub static OP_LE: BinaryOp = BinaryOp { name: "<=", f: |a, b| (a <= b) as i64 as f64, string_op: None };
pub static OP_GT: BinaryOp = BinaryOp { name: ">", f: |a, b| (a > b) as i64 as f64, string_op: None };
pub static OP_GE: BinaryOp = BinaryOp { name: ">=", f: |a, b| (a >= b) as i64 as f64, string_op: None };
pub static OP_EQ: BinaryOp = BinaryOp { name: "==", f: |a, b| (a == b) as i64 as f64, string_op: None };
pub static OP_NE: BinaryOp = BinaryOp { name: "!=", f: |a, b| (a != b) as i64 as f64, string_op: None };

/// One-argument lowering over a signal.
struct UnaryZ {
    op: &'static UnaryOp,
    a: ZIn,
    block: usize,
}

impl Gen for UnaryZ {
    fn type_name(&self) -> &'static str {
        self.op.name
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        while out.len() < self.block {
            let want = self.block - out.len();
            let k = match self.a.run(th, want)? {
                ZRun::Done => break,
                ZRun::Constant(c) => {
                    let y = (self.op.f)(c);
                    for _ in 0..want {
                        out.pushz(y);
                    }
                    want
                }
                ZRun::Items(items) => {
                    for &x in items {
                        out.pushz((self.op.f)(x));
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

/// One-argument lowering over a stream: pointwise and recursive.
struct UnaryV {
    op: &'static UnaryOp,
    a: VIn,
}

impl Gen for UnaryV {
    fn type_name(&self) -> &'static str {
        self.op.name
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        match self.a.one(th)? {
            None => Ok(Pull::End),
            Some(x) => {
                let y = unary_op(th, self.op, &x)?;
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.push(y);
                Ok(Pull::fill(out))
            }
        }
    }
}

/// Apply a unary operation to a value, lowering over lists.
pub fn unary_op(th: &mut Thread, op: &'static UnaryOp, a: &V) -> Result<V> {
    match a {
        V::Real(x) => Ok(V::Real((op.f)(*x))),
        V::List(list) if list.kind() == ItemKind::Z => {
            let gen = UnaryZ {
                op,
                a: ZIn::new(a.clone()),
                block: z_block_size(th),
            };
            Ok(V::List(List::from_gen(ItemKind::Z, list.finite(), Box::new(gen))))
        }
        V::List(list) => {
            let gen = UnaryV {
                op,
                a: VIn::new(a.clone()),
            };
            Ok(V::List(List::from_gen(ItemKind::V, list.finite(), Box::new(gen))))
        }
        V::Ref(_) | V::ZRef(_) => {
            let inner = a.deref();
            unary_op(th, op, &inner)
        }
        V::Each(e) => unary_op(th, op, &e.v.clone()),
        other => Err(wrong_type(op.name, "Real or List", other.type_name())),
    }
}

/// Two-signal lowering: lockstep pull, ending with the shorter input.
struct BinaryZ {
    op: &'static BinaryOp,
    a: ZIn,
    b: ZIn,
    block: usize,
}

impl Gen for BinaryZ {
    fn type_name(&self) -> &'static str {
        self.op.name
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        enum Side {
            Const(f64),
            Buf(Vec<f64>),
        }
        let f = self.op.f;
        let mut out = Array::with_capacity(ItemKind::Z, self.block);
        loop {
            let want = self.block - out.len();
            if want == 0 {
                break;
            }
            let a = match self.a.run(th, want)? {
                ZRun::Done => break,
                ZRun::Constant(c) => Side::Const(c),
                ZRun::Items(items) => Side::Buf(items.to_vec()),
            };
            let b_want = match &a {
                Side::Const(_) => want,
                Side::Buf(items) => items.len(),
            };
            let (ka, kb) = match (&a, self.b.run(th, b_want)?) {
                (_, ZRun::Done) => break,
                (Side::Const(x), ZRun::Constant(y)) => {
                    let z = f(*x, y);
                    for _ in 0..want {
                        out.pushz(z);
                    }
                    (0, 0)
                }
                (Side::Const(x), ZRun::Items(ys)) => {
                    for &y in ys {
                        out.pushz(f(*x, y));
                    }
                    (0, ys.len())
                }
                (Side::Buf(xs), ZRun::Constant(y)) => {
                    for &x in xs {
                        out.pushz(f(x, y));
                    }
                    (xs.len(), 0)
                }
                (Side::Buf(xs), ZRun::Items(ys)) => {
                    let k = xs.len().min(ys.len());
                    for i in 0..k {
                        out.pushz(f(xs[i], ys[i]));
                    }
                    (k, k)
                }
            };
            self.a.advance(ka);
            self.b.advance(kb);
            if ka == 0 && kb == 0 {
                // both inputs constant: the block is already full
                break;
            }
        }
        if out.is_empty() {
            Ok(Pull::End)
        } else {
            Ok(Pull::fill(out))
        }
    }
}

/// Two-stream lowering: pointwise and recursive over elements.
struct BinaryV {
    op: &'static BinaryOp,
    a: BothIn,
    b: BothIn,
}

impl Gen for BinaryV {
    fn type_name(&self) -> &'static str {
        self.op.name
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let x = match self.a.one(th)? {
            Some(x) => x,
            None => return Ok(Pull::End),
        };
        let y = match self.b.one(th)? {
            Some(y) => y,
            None => return Ok(Pull::End),
        };
        let z = binary_op(th, self.op, &x, &y)?;
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(z);
        Ok(Pull::fill(out))
    }
}

fn is_z_carrier(v: &V) -> bool {
    match v {
        V::Real(_) => true,
        V::List(list) => list.kind() == ItemKind::Z,
        _ => false,
    }
}

/// Apply a binary operation, dispatching on the operand type pair.
pub fn binary_op(th: &mut Thread, op: &'static BinaryOp, a: &V, b: &V) -> Result<V> {
    let a = a.deref();
    let b = b.deref();
    match (&a, &b) {
        (V::Real(x), V::Real(y)) => Ok(V::Real((op.f)(*x, *y))),
        (V::Str(x), V::Str(y)) => match op.string_op {
            Some(f) => Ok(f(x, y)),
            None => Err(Error::UndefinedOperation(op.name.to_string())),
        },
        _ if a.is_list() || b.is_list() => {
            let finite = a.is_finite() || b.is_finite();
            if is_z_carrier(&a) && is_z_carrier(&b) {
                let gen = BinaryZ {
                    op,
                    a: ZIn::new(a.clone()),
                    b: ZIn::new(b.clone()),
                    block: z_block_size(th),
                };
                Ok(V::List(List::from_gen(ItemKind::Z, finite, Box::new(gen))))
            } else {
                let gen = BinaryV {
                    op,
                    a: BothIn::new(a.clone()),
                    b: BothIn::new(b.clone()),
                };
                Ok(V::List(List::from_gen(ItemKind::V, finite, Box::new(gen))))
            }
        }
        _ => Err(wrong_type(op.name, "Real, String or List", a.type_name())),
    }
}

/// Running fold: emits the accumulator after each input element.
struct ScanGen {
    f: V,
    acc: V,
    input: BothIn,
}

impl Gen for ScanGen {
    fn type_name(&self) -> &'static str {
        "Scan"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        match self.input.one(th)? {
            None => Ok(Pull::End),
            Some(x) => {
                let results = th.apply_with(&self.f, vec![self.acc.clone(), x])?;
                self.acc = results.into_iter().next().unwrap_or_default();
                let mut out = Array::with_capacity(ItemKind::V, 1);
                out.push(self.acc.clone());
                Ok(Pull::fill(out))
            }
        }
    }
}

/// Adjacent pairs through a combining fun: one output per input after
/// the first.
struct PairsGen {
    f: V,
    prev: Option<V>,
    input: BothIn,
}

impl Gen for PairsGen {
    fn type_name(&self) -> &'static str {
        "Pairs"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        loop {
            match self.input.one(th)? {
                None => return Ok(Pull::End),
                Some(x) => match self.prev.take() {
                    None => {
                        self.prev = Some(x);
                    }
                    Some(p) => {
                        let results = th.apply_with(&self.f, vec![p, x.clone()])?;
                        self.prev = Some(x);
                        let mut out = Array::with_capacity(ItemKind::V, 1);
                        out.push(results.into_iter().next().unwrap_or_default());
                        return Ok(Pull::fill(out));
                    }
                },
            }
        }
    }
}

fn reduce_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let f = th.pop_fun("reduce : fun")?;
    let init = th.pop()?;
    let seq = th.pop()?;
    if !seq.is_finite() {
        return Err(indefinite_op("reduce"));
    }
    let mut acc = init;
    let mut input = BothIn::new(seq);
    while let Some(x) = input.one(th)? {
        let results = th.apply_with(&f, vec![acc, x])?;
        acc = results.into_iter().next().unwrap_or_default();
    }
    th.push(acc)
}

fn scan_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let f = th.pop_fun("scan : fun")?;
    let init = th.pop()?;
    let seq = th.pop()?;
    let finite = seq.is_finite();
    let gen = ScanGen {
        f,
        acc: init,
        input: BothIn::new(seq),
    };
    th.push(V::List(List::from_gen(ItemKind::V, finite, Box::new(gen))))
}

fn pairs_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let f = th.pop_fun("pairs : fun")?;
    let seq = th.pop()?;
    let finite = seq.is_finite();
    let gen = PairsGen {
        f,
        prev: None,
        input: BothIn::new(seq),
    };
    th.push(V::List(List::from_gen(ItemKind::V, finite, Box::new(gen))))
}

/// Fold a finite sequence with a binary operation; `empty` is the result
/// for an empty input.
fn fold_with(th: &mut Thread, op: &'static BinaryOp, seq: V, empty: V, msg: &str) -> Result<V> {
    if !seq.is_finite() {
        return Err(indefinite_op(msg));
    }
    let mut input = BothIn::new(seq);
    let mut acc: Option<V> = None;
    while let Some(x) = input.one(th)? {
        acc = Some(match acc {
            None => x,
            Some(a) => binary_op(th, op, &a, &x)?,
        });
    }
    Ok(acc.unwrap_or(empty))
}

fn sum_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let seq = th.pop()?;
    let out = fold_with(th, &OP_ADD, seq, V::Real(0.0), "sum")?;
    th.push(out)
}

fn prod_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let seq = th.pop()?;
    let out = fold_with(th, &OP_MUL, seq, V::Real(1.0), "prod")?;
    th.push(out)
}

fn mins_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let seq = th.pop()?;
    let out = fold_with(th, &OP_MIN, seq, V::Real(0.0), "mins")?;
    th.push(out)
}

fn maxs_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let seq = th.pop()?;
    let out = fold_with(th, &OP_MAX, seq, V::Real(0.0), "maxs")?;
    th.push(out)
}

fn mean_(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
    let seq = th.pop()?;
    if !seq.is_finite() {
        return Err(indefinite_op("mean"));
    }
    let mut input = BothIn::new(seq);
    let mut acc = V::Real(0.0);
    let mut n = 0i64;
    while let Some(x) = input.one(th)? {
        acc = binary_op(th, &OP_ADD, &acc, &x)?;
        n += 1;
    }
    if n == 0 {
        return th.push(V::Real(0.0));
    }
    let out = binary_op(th, &OP_MUL, &acc, &V::Real(1.0 / n as f64))?;
    th.push(out)
}

macro_rules! install_unary {
    ($t:expr, $opconst:ident, $name:literal, $help:literal) => {{
        fn body(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
            let a = th.pop()?;
            let r = unary_op(th, &$opconst, &a)?;
            th.push(r)
        }
        def($t, $name, 1, 1, body, $help);
    }};
}

macro_rules! install_binary {
    ($t:expr, $opconst:ident, $name:literal, $help:literal) => {{
        fn body(th: &mut Thread, _prim: &crate::fun::Prim) -> Result<()> {
            let b = th.pop()?;
            let a = th.pop()?;
            let r = binary_op(th, &$opconst, &a, &b)?;
            th.push(r)
        }
        def($t, $name, 2, 1, body, $help);
    }};
}

pub fn install(t: &GTable) {
    install_unary!(t, OP_NEG, "neg", "(a --> -a) negate.");
    install_unary!(t, OP_ABS, "abs", "(a --> |a|) absolute value.");
    install_unary!(t, OP_SGN, "sgn", "(a --> sign) -1, 0 or 1.");
    install_unary!(t, OP_RECIP, "recip", "(a --> 1/a) reciprocal.");
    install_unary!(t, OP_SQ, "sq", "(a --> a^2) square.");
    install_unary!(t, OP_SQRT, "sqrt", "(a --> √a) square root.");
    install_unary!(t, OP_CB, "cb", "(a --> a^3) cube.");
    install_unary!(t, OP_CBRT, "cbrt", "(a --> a^(1/3)) cube root.");
    install_unary!(t, OP_EXP, "exp", "(a --> e^a) exponential.");
    install_unary!(t, OP_LOG, "log", "(a --> ln a) natural logarithm.");
    install_unary!(t, OP_LOG2, "log2", "(a --> log2 a) base 2 logarithm.");
    install_unary!(t, OP_LOG10, "log10", "(a --> log10 a) base 10 logarithm.");
    install_unary!(t, OP_SIN, "sin", "(a --> sin a) sine.");
    install_unary!(t, OP_COS, "cos", "(a --> cos a) cosine.");
    install_unary!(t, OP_TAN, "tan", "(a --> tan a) tangent.");
    install_unary!(t, OP_ASIN, "asin", "(a --> asin a) arcsine.");
    install_unary!(t, OP_ACOS, "acos", "(a --> acos a) arccosine.");
    install_unary!(t, OP_ATAN, "atan", "(a --> atan a) arctangent.");
    install_unary!(t, OP_SINH, "sinh", "(a --> sinh a) hyperbolic sine.");
    install_unary!(t, OP_COSH, "cosh", "(a --> cosh a) hyperbolic cosine.");
    install_unary!(t, OP_TANH, "tanh", "(a --> tanh a) hyperbolic tangent.");
    install_unary!(t, OP_FLOOR, "floor", "(a --> ⌊a⌋) round down.");
    install_unary!(t, OP_CEIL, "ceil", "(a --> ⌈a⌉) round up.");
    install_unary!(t, OP_ROUND, "round", "(a --> round a) round to nearest.");
    install_unary!(t, OP_FRAC, "frac", "(a --> a-⌊a⌋) fractional part.");
    install_unary!(t, OP_DISTORT, "distort", "(a --> out) soft saturation a/(1+|a|).");
    install_unary!(t, OP_SOFTCLIP, "softclip", "(a --> out) cubic soft clip to ±1.");

    install_binary!(t, OP_ADD, "+", "(a b --> a+b) add. strings concatenate.");
    install_binary!(t, OP_SUB, "-", "(a b --> a-b) subtract.");
    install_binary!(t, OP_MUL, "*", "(a b --> a*b) multiply.");
    install_binary!(t, OP_DIV, "/", "(a b --> a/b) divide.");
    install_binary!(t, OP_IDIV, "div", "(a b --> ⌊a/b⌋) floor division.");
    install_binary!(t, OP_MOD, "%", "(a b --> a mod b) floored modulo.");
    install_binary!(t, OP_POW, "**", "(a b --> a^b) power.");
    install_binary!(t, OP_MIN, "min", "(a b --> min) smaller of two.");
    install_binary!(t, OP_MAX, "max", "(a b --> max) larger of two.");
    install_binary!(t, OP_ATAN2, "atan2", "(y x --> angle) two argument arctangent.");
    install_binary!(t, OP_HYPOT, "hypot", "(a b --> √(a²+b²)) euclidean distance.");
    install_binary!(t, OP_AVG, "avg2", "(a b --> (a+b)/2) mean of two.");
    install_binary!(t, OP_ABSDIF, "absdif", "(a b --> |a-b|) absolute difference.");
    install_binary!(t, OP_LT, "<", "(a b --> bool) less than.");
    install_binary!(t, OP_LE, "<=", "(a b --> bool) less or equal.");
    install_binary!(t, OP_GT, ">", "(a b --> bool) greater than.");
    install_binary!(t, OP_GE, ">=", "(a b --> bool) greater or equal.");
    install_binary!(t, OP_EQ, "==", "(a b --> bool) numeric equality.");
    install_binary!(t, OP_NE, "!=", "(a b --> bool) numeric inequality.");

    def(t, "reduce", 3, 1, reduce_, "(in z fun --> out) fold a finite sequence from z.");
    def(t, "scan", 3, 1, scan_, "(in z fun --> out) running fold; one output per input.");
    def(t, "pairs", 2, 1, pairs_, "(in fun --> out) combine adjacent elements pairwise.");
    def(t, "sum", 1, 1, sum_, "(in --> out) sum of a finite sequence.");
    def(t, "prod", 1, 1, prod_, "(in --> out) product of a finite sequence.");
    def(t, "mins", 1, 1, mins_, "(in --> out) minimum of a finite sequence.");
    def(t, "maxs", 1, 1, maxs_, "(in --> out) maximum of a finite sequence.");
    def(t, "mean", 1, 1, mean_, "(in --> out) mean of a finite sequence.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_ops() {
        let mut th = Thread::for_tests();
        let r = binary_op(&mut th, &OP_ADD, &V::Real(5.0), &V::Real(3.0)).unwrap();
        assert_eq!(r.to_float_lossy(), 8.0);
        let r = binary_op(&mut th, &OP_MOD, &V::Real(-1.0), &V::Real(4.0)).unwrap();
        assert_eq!(r.to_float_lossy(), 3.0);
    }

    #[test]
    fn string_concat() {
        let mut th = Thread::for_tests();
        let a = V::Str(Arc::new(Str::new("foo")));
        let b = V::Str(Arc::new(Str::new("bar")));
        let r = binary_op(&mut th, &OP_ADD, &a, &b).unwrap();
        match r {
            V::Str(s) => assert_eq!(s.as_str(), "foobar"),
            other => panic!("expected string, got {}", other.type_name()),
        }
        assert!(matches!(
            binary_op(&mut th, &OP_SUB, &a, &b),
            Err(Error::UndefinedOperation(_))
        ));
    }
}
