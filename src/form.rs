//! Records with prototype inheritance.
//!
//! A `TableMap` maps interned keys to slot indices, a `Table` pairs a map
//! with values, and a `Form` stacks a table over parent forms. Method
//! resolution order over multiple parents is linearized C3-style when the
//! form is built.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{not_found, Error, Result};
use crate::symbol::Str;
use crate::value::V;
use crate::vm::Thread;

/// An ordered mapping from interned keys to slot indices. Shared between
/// tables with the same shape.
#[derive(Debug)]
pub struct TableMap {
    keys: Vec<Arc<Str>>,
}

impl TableMap {
    pub fn new(keys: Vec<Arc<Str>>) -> Arc<TableMap> {
        Arc::new(TableMap { keys })
    }

    pub fn single(key: Arc<Str>) -> Arc<TableMap> {
        TableMap::new(vec![key])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> &[Arc<Str>] {
        &self.keys
    }

    pub fn index_of(&self, key: &Str) -> Option<usize> {
        self.keys
            .iter()
            .position(|k| k.hash() == key.hash() && k.as_str() == key.as_str())
    }
}

/// A values array indexed by its map.
#[derive(Debug)]
pub struct Table {
    map: Arc<TableMap>,
    values: Vec<V>,
}

impl Table {
    pub fn new(map: Arc<TableMap>, values: Vec<V>) -> Arc<Table> {
        debug_assert!(map.len() == values.len());
        Arc::new(Table { map, values })
    }

    pub fn empty() -> Arc<Table> {
        Table::new(TableMap::new(Vec::new()), Vec::new())
    }

    pub fn map(&self) -> &Arc<TableMap> {
        &self.map
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn get(&self, key: &Str) -> Option<V> {
        self.map.index_of(key).map(|i| self.values[i].clone())
    }

    pub fn equals(a: &Table, b: &Table, th: &mut Thread) -> Result<bool> {
        if a.map.len() != b.map.len() {
            return Ok(false);
        }
        for (key, value) in a.map.keys().iter().zip(&a.values) {
            match b.get(key) {
                Some(other) => {
                    if !value.equals(th, &other)? {
                        return Ok(false);
                    }
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// A copy with every value chased by `n`.
    pub fn chase(&self, th: &mut Thread, n: i64) -> Result<Arc<Table>> {
        let mut values = Vec::with_capacity(self.values.len());
        for v in &self.values {
            values.push(v.chase(th, n)?);
        }
        Ok(Table::new(self.map.clone(), values))
    }
}

/// A record: a table plus parent forms. Lookup scans the own table, then
/// the precomputed linearization.
#[derive(Debug)]
pub struct Form {
    table: Arc<Table>,
    parents: Vec<Arc<Form>>,
    mro: Vec<Arc<Form>>,
    no_each: AtomicBool,
}

impl Form {
    /// Build a form, linearizing its parents. Fails with
    /// `inconsistent inheritance` when no C3 order exists.
    pub fn new(table: Arc<Table>, parents: Vec<Arc<Form>>) -> Result<Arc<Form>> {
        let mro = linearize(&parents)?;
        Ok(Arc::new(Form {
            table,
            parents,
            mro,
            no_each: AtomicBool::new(false),
        }))
    }

    /// The empty form: no slots, no parents.
    pub fn empty() -> Arc<Form> {
        Arc::new(Form {
            table: Table::empty(),
            parents: Vec::new(),
            mro: Vec::new(),
            no_each: AtomicBool::new(false),
        })
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn parents(&self) -> &[Arc<Form>] {
        &self.parents
    }

    pub fn mro(&self) -> &[Arc<Form>] {
        &self.mro
    }

    pub fn no_each(&self) -> bool {
        self.no_each.load(Ordering::Relaxed)
    }

    pub fn set_no_each(&self) {
        self.no_each.store(true, Ordering::Relaxed);
    }

    fn key_str<'a>(key: &'a V) -> Option<&'a Str> {
        match key {
            V::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn get(&self, key: &V) -> Option<V> {
        let key = Self::key_str(key)?;
        if let Some(v) = self.table.get(key) {
            return Some(v);
        }
        for ancestor in &self.mro {
            if let Some(v) = ancestor.table.get(key) {
                return Some(v);
            }
        }
        None
    }

    pub fn must_get(&self, key: &V) -> Result<V> {
        self.get(key).ok_or_else(|| match key {
            V::Str(s) => not_found(s.as_str()),
            _ => not_found("key"),
        })
    }

    pub fn equals(a: &Arc<Form>, b: &Arc<Form>, th: &mut Thread) -> Result<bool> {
        if Arc::ptr_eq(a, b) {
            return Ok(true);
        }
        if a.parents.len() != b.parents.len() {
            return Ok(false);
        }
        if !Table::equals(&a.table, &b.table, th)? {
            return Ok(false);
        }
        for (pa, pb) in a.parents.iter().zip(&b.parents) {
            if !Form::equals(pa, pb, th)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub fn chase(self: &Arc<Self>, th: &mut Thread, n: i64) -> Result<Arc<Form>> {
        let table = self.table.chase(th, n)?;
        Form::new(table, self.parents.clone())
    }

    pub fn print(
        self: &Arc<Self>,
        th: &mut Thread,
        out: &mut String,
        depth: usize,
        budget: &mut i64,
    ) -> Result<()> {
        out.push_str("'{");
        for (key, value) in self.table.map().keys().iter().zip(self.table.values()) {
            if *budget <= 0 {
                out.push_str(" ...");
                break;
            }
            *budget -= 1;
            out.push(' ');
            out.push_str(key.as_str());
            out.push_str(": ");
            value.print_limited(th, out, depth + 1, budget)?;
        }
        out.push_str(" }");
        Ok(())
    }
}

/// C3 linearization over the parents' own linearizations, with local
/// precedence order as the final sequence.
fn linearize(parents: &[Arc<Form>]) -> Result<Vec<Arc<Form>>> {
    if parents.is_empty() {
        return Ok(Vec::new());
    }
    let mut seqs: Vec<Vec<Arc<Form>>> = parents
        .iter()
        .map(|p| {
            let mut s = Vec::with_capacity(1 + p.mro.len());
            s.push(p.clone());
            s.extend(p.mro.iter().cloned());
            s
        })
        .collect();
    seqs.push(parents.to_vec());

    let mut out = Vec::new();
    loop {
        seqs.retain(|s| !s.is_empty());
        if seqs.is_empty() {
            return Ok(out);
        }
        // pick the earliest head that appears in no tail
        let mut chosen: Option<Arc<Form>> = None;
        'candidates: for s in &seqs {
            let head = &s[0];
            for t in &seqs {
                if t[1..].iter().any(|x| Arc::ptr_eq(x, head)) {
                    continue 'candidates;
                }
            }
            chosen = Some(head.clone());
            break;
        }
        let head = chosen.ok_or(Error::InconsistentInheritance)?;
        if !out.iter().any(|x: &Arc<Form>| Arc::ptr_eq(x, &head)) {
            out.push(head.clone());
        }
        for s in &mut seqs {
            if !s.is_empty() && Arc::ptr_eq(&s[0], &head) {
                s.remove(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::getsym;

    fn form_with(keys: &[(&str, f64)], parents: Vec<Arc<Form>>) -> Arc<Form> {
        let map = TableMap::new(keys.iter().map(|(k, _)| getsym(k)).collect());
        let values = keys.iter().map(|&(_, v)| V::Real(v)).collect();
        Form::new(Table::new(map, values), parents).unwrap()
    }

    #[test]
    fn lookup_walks_parents_with_shadowing() {
        let base = form_with(&[("a", 1.0), ("b", 2.0)], vec![]);
        let child = form_with(&[("b", 20.0)], vec![base.clone()]);
        let a = getsym("a");
        let b = getsym("b");
        assert_eq!(child.get(&V::Str(a)).unwrap().to_float_lossy(), 1.0);
        assert_eq!(child.get(&V::Str(b)).unwrap().to_float_lossy(), 20.0);
        assert!(child.get(&V::Str(getsym("c"))).is_none());
    }

    #[test]
    fn diamond_linearization_prefers_local_order() {
        let root = form_with(&[("x", 0.0)], vec![]);
        let left = form_with(&[("x", 1.0)], vec![root.clone()]);
        let right = form_with(&[("x", 2.0)], vec![root.clone()]);
        let child = form_with(&[], vec![left.clone(), right.clone()]);
        // C3: child, left, right, root
        assert!(Arc::ptr_eq(&child.mro()[0], &left));
        assert!(Arc::ptr_eq(&child.mro()[1], &right));
        assert!(Arc::ptr_eq(&child.mro()[2], &root));
        assert_eq!(child.get(&V::Str(getsym("x"))).unwrap().to_float_lossy(), 1.0);
    }

    #[test]
    fn inconsistent_hierarchy_is_rejected() {
        let a = form_with(&[], vec![]);
        let b = form_with(&[], vec![a.clone()]);
        // demands a before b and b before a at once
        let child = Form::new(Table::empty(), vec![a.clone(), b.clone()]);
        match child {
            Err(Error::InconsistentInheritance) => {}
            other => panic!("expected inconsistent inheritance, got {other:?}"),
        }
    }
}
