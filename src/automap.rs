//! Multichannel expansion: lifting scalar-expecting callables over list
//! arguments.
//!
//! A primitive may declare a mask over its arguments (`a` as-is, `k`
//! scalar expected, `z` signal-or-scalar expected); any argument may also
//! be marked explicitly with `@`. When a marked or over-deep argument is
//! a list, the call is lifted: it runs once per element and the results
//! are collected into a stream. Finite axes expand eagerly; an indefinite
//! axis produces a lazy lifting generator.

use std::sync::Arc;

use crate::array::{Array, ItemKind};
use crate::error::{Error, Result};
use crate::gen::{Gen, Pull};
use crate::input::BothIn;
use crate::list::List;
use crate::value::{EachOp, V};
use crate::vm::Thread;

enum ArgPlan {
    Fixed(V),
    Lift { source: V, rewrap: u32 },
}

/// Apply a fun or prim, expanding marked or mask-lifted list arguments.
/// This is the single entry point every call site goes through.
pub fn apply_call(th: &mut Thread, f: &V) -> Result<()> {
    let takes = f.takes();
    let mask = match f {
        V::Prim(p) if p.no_each => None,
        _ => f.automap_mask(),
    };
    let mut any_each = false;
    if !matches!(f, V::Prim(p) if p.no_each) {
        for i in 0..takes.min(th.depth()) {
            if matches!(th.pick(i), Ok(V::Each(_))) {
                any_each = true;
                break;
            }
        }
    }
    if (mask.is_none() && !any_each) || takes == 0 {
        return invoke_raw(th, f);
    }

    let args = th.pop_n(takes)?;
    let mut plans = Vec::with_capacity(takes);
    let mut lifted = 0usize;
    for (i, arg) in args.into_iter().enumerate() {
        let plan = match arg {
            V::Each(e) if e.depth > 0 => {
                if e.v.is_list() && !e.v.no_each() {
                    ArgPlan::Lift {
                        source: e.v.clone(),
                        rewrap: e.depth - 1,
                    }
                } else {
                    ArgPlan::Fixed(e.v.clone())
                }
            }
            V::Each(e) => ArgPlan::Fixed(e.v.clone()),
            arg => {
                let c = mask.and_then(|m| m.as_bytes().get(i).copied()).unwrap_or(b'a');
                let lift = match c {
                    b'k' => arg.is_list() && !arg.no_each(),
                    b'z' => arg.is_vlist() && !arg.no_each(),
                    _ => false,
                };
                if lift {
                    ArgPlan::Lift {
                        source: arg,
                        rewrap: 0,
                    }
                } else {
                    ArgPlan::Fixed(arg)
                }
            }
        };
        if matches!(plan, ArgPlan::Lift { .. }) {
            lifted += 1;
        }
        plans.push(plan);
    }

    if lifted == 0 {
        for plan in plans {
            match plan {
                ArgPlan::Fixed(v) => th.push(v)?,
                ArgPlan::Lift { .. } => unreachable!(),
            }
        }
        return invoke_raw(th, f);
    }

    let all_finite = plans.iter().all(|p| match p {
        ArgPlan::Lift { source, .. } => source.is_finite(),
        ArgPlan::Fixed(_) => true,
    });
    if all_finite {
        expand_eager(th, f, plans)
    } else {
        expand_lazy(th, f, plans)
    }
}

fn invoke_raw(th: &mut Thread, f: &V) -> Result<()> {
    match f {
        V::Fun(fun) => th.call_fun(fun),
        V::Prim(p) => (p.func)(th, p),
        other => th.push(other.clone()),
    }
}

fn element(source: &Arc<List>, j: i64, rewrap: u32) -> V {
    let item = source.at(j);
    if rewrap > 0 {
        V::Each(Arc::new(EachOp::new(item, rewrap)))
    } else {
        item
    }
}

fn tuple_or_single(results: Vec<V>) -> V {
    if results.len() == 1 {
        results.into_iter().next().unwrap()
    } else {
        let mut array = Array::with_capacity(ItemKind::V, results.len());
        for r in results {
            array.push(r);
        }
        V::List(List::packed(array))
    }
}

fn expand_eager(th: &mut Thread, f: &V, plans: Vec<ArgPlan>) -> Result<()> {
    enum Packed {
        Fixed(V),
        Lift(Arc<List>, u32),
    }
    let mut packed = Vec::with_capacity(plans.len());
    let mut n = usize::MAX;
    for plan in plans {
        match plan {
            ArgPlan::Fixed(v) => packed.push(Packed::Fixed(v)),
            ArgPlan::Lift { source, rewrap } => {
                let list = match &source {
                    V::List(list) => list.clone(),
                    _ => return Err(Error::Internal("expansion over a non-list".to_string())),
                };
                let list = list
                    .pack_limit(th, crate::MAX_EXPANSION)?
                    .ok_or_else(|| Error::Failed("expansion too large".to_string()))?;
                n = n.min(list.array().map(|a| a.len()).unwrap_or(0));
                packed.push(Packed::Lift(list, rewrap));
            }
        }
    }
    let mut out = Array::with_capacity(ItemKind::V, n);
    for j in 0..n {
        let call_args: Vec<V> = packed
            .iter()
            .map(|p| match p {
                Packed::Fixed(v) => v.clone(),
                Packed::Lift(list, rewrap) => element(list, j as i64, *rewrap),
            })
            .collect();
        let results = th.apply_with(f, call_args)?;
        out.push(tuple_or_single(results));
    }
    th.push(V::List(List::packed(out)))
}

enum EachArg {
    Fixed(V),
    Iter(BothIn, u32),
}

/// Lifts a call lazily: each pull draws one element from every iterated
/// argument, invokes the callable, and emits the result.
struct EachGen {
    f: V,
    args: Vec<EachArg>,
}

impl Gen for EachGen {
    fn type_name(&self) -> &'static str {
        "EachGen"
    }

    fn pull(&mut self, th: &mut Thread) -> Result<Pull> {
        let mut call_args = Vec::with_capacity(self.args.len());
        for arg in &mut self.args {
            match arg {
                EachArg::Fixed(v) => call_args.push(v.clone()),
                EachArg::Iter(cursor, rewrap) => match cursor.one(th)? {
                    None => return Ok(Pull::End),
                    Some(item) => {
                        if *rewrap > 0 {
                            call_args
                                .push(V::Each(Arc::new(EachOp::new(item, *rewrap))));
                        } else {
                            call_args.push(item);
                        }
                    }
                },
            }
        }
        let results = th.apply_with(&self.f, call_args)?;
        let mut out = Array::with_capacity(ItemKind::V, 1);
        out.push(tuple_or_single(results));
        Ok(Pull::fill(out))
    }
}

fn expand_lazy(th: &mut Thread, f: &V, plans: Vec<ArgPlan>) -> Result<()> {
    let mut finite = false;
    let mut args = Vec::with_capacity(plans.len());
    for plan in plans {
        match plan {
            ArgPlan::Fixed(v) => args.push(EachArg::Fixed(v)),
            ArgPlan::Lift { source, rewrap } => {
                finite = finite || source.is_finite();
                args.push(EachArg::Iter(BothIn::new(source), rewrap));
            }
        }
    }
    let gen = EachGen { f: f.clone(), args };
    th.push(V::List(List::from_gen(ItemKind::V, finite, Box::new(gen))))
}
