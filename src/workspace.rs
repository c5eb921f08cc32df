//! The top-level mutable environment: a persistent hash tree under an
//! atomically swapped root, wrapped in a prototype chain.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::{not_found, Result};
use crate::symbol::Str;
use crate::value::V;

/// A node of the persistent binary tree, ordered by key hash then key
/// text. Inserting builds a new path and shares the rest.
#[derive(Debug)]
pub struct TreeNode {
    key: Arc<Str>,
    value: V,
    serial: i64,
    left: Option<Arc<TreeNode>>,
    right: Option<Arc<TreeNode>>,
}

impl TreeNode {
    fn leaf(key: Arc<Str>, value: V, serial: i64) -> Arc<TreeNode> {
        Arc::new(TreeNode {
            key,
            value,
            serial,
            left: None,
            right: None,
        })
    }

    fn cmp_key(&self, key: &Str) -> std::cmp::Ordering {
        match self.key.hash().cmp(&key.hash()) {
            std::cmp::Ordering::Equal => self.key.as_str().cmp(key.as_str()),
            other => other,
        }
    }

    fn get(&self, key: &Str) -> Option<V> {
        match self.cmp_key(key) {
            std::cmp::Ordering::Equal => Some(self.value.clone()),
            std::cmp::Ordering::Less => self.right.as_ref().and_then(|n| n.get(key)),
            std::cmp::Ordering::Greater => self.left.as_ref().and_then(|n| n.get(key)),
        }
    }

    /// Pure insertion: a new tree sharing all untouched nodes.
    fn put_pure(self: &Arc<Self>, key: Arc<Str>, value: V, serial: i64) -> Arc<TreeNode> {
        match self.cmp_key(&key) {
            std::cmp::Ordering::Equal => Arc::new(TreeNode {
                key,
                value,
                serial: self.serial,
                left: self.left.clone(),
                right: self.right.clone(),
            }),
            std::cmp::Ordering::Less => Arc::new(TreeNode {
                key: self.key.clone(),
                value: self.value.clone(),
                serial: self.serial,
                left: self.left.clone(),
                right: Some(match &self.right {
                    Some(r) => r.put_pure(key, value, serial),
                    None => TreeNode::leaf(key, value, serial),
                }),
            }),
            std::cmp::Ordering::Greater => Arc::new(TreeNode {
                key: self.key.clone(),
                value: self.value.clone(),
                serial: self.serial,
                left: Some(match &self.left {
                    Some(l) => l.put_pure(key, value, serial),
                    None => TreeNode::leaf(key, value, serial),
                }),
                right: self.right.clone(),
            }),
        }
    }

    fn get_all(&self, out: &mut Vec<(i64, Arc<Str>, V)>) {
        if let Some(l) = &self.left {
            l.get_all(out);
        }
        out.push((self.serial, self.key.clone(), self.value.clone()));
        if let Some(r) = &self.right {
            r.get_all(out);
        }
    }
}

/// A table of bindings behind a swap-on-write root. Readers grab the root
/// once and traverse without holding the lock.
#[derive(Debug, Default)]
pub struct GTable {
    root: Mutex<Option<Arc<TreeNode>>>,
    next_serial: AtomicI64,
}

impl GTable {
    pub fn new() -> GTable {
        GTable::default()
    }

    pub fn get(&self, key: &Str) -> Option<V> {
        let root = self.root.lock().unwrap().clone();
        root.and_then(|n| n.get(key))
    }

    pub fn must_get(&self, key: &Str) -> Result<V> {
        self.get(key).ok_or_else(|| not_found(key.as_str()))
    }

    /// Install or replace a binding in place. Returns true when the key
    /// was new.
    pub fn put_impure(&self, key: Arc<Str>, value: V) -> bool {
        let serial = self.next_serial.fetch_add(1, Ordering::Relaxed);
        let mut root = self.root.lock().unwrap();
        match &*root {
            Some(tree) => {
                let added = tree.get(&key).is_none();
                *root = Some(tree.put_pure(key, value, serial));
                added
            }
            None => {
                *root = Some(TreeNode::leaf(key, value, serial));
                true
            }
        }
    }

    /// A new table with the binding added; this one is untouched.
    pub fn put_pure(&self, key: Arc<Str>, value: V) -> GTable {
        let serial = self.next_serial.load(Ordering::Relaxed);
        let root = self.root.lock().unwrap().clone();
        let new_root = match root {
            Some(tree) => tree.put_pure(key, value, serial),
            None => TreeNode::leaf(key, value, serial),
        };
        GTable {
            root: Mutex::new(Some(new_root)),
            next_serial: AtomicI64::new(serial + 1),
        }
    }

    /// All bindings in definition order.
    pub fn sorted(&self) -> Vec<(Arc<Str>, V)> {
        let root = self.root.lock().unwrap().clone();
        let mut all = Vec::new();
        if let Some(tree) = root {
            tree.get_all(&mut all);
        }
        all.sort_by_key(|(serial, _, _)| *serial);
        all.into_iter().map(|(_, k, v)| (k, v)).collect()
    }
}

/// The workspace: a chain of binding tables with prototype lookup. The
/// head table is the mutable layer new definitions land in.
#[derive(Debug)]
pub struct GForm {
    table: Arc<GTable>,
    next: Option<Arc<GForm>>,
}

impl GForm {
    pub fn new(table: Arc<GTable>, next: Option<Arc<GForm>>) -> Arc<GForm> {
        Arc::new(GForm { table, next })
    }

    pub fn fresh() -> Arc<GForm> {
        GForm::new(Arc::new(GTable::new()), None)
    }

    pub fn table(&self) -> &Arc<GTable> {
        &self.table
    }

    pub fn next(&self) -> Option<&Arc<GForm>> {
        self.next.as_ref()
    }

    pub fn get(&self, key: &V) -> Option<V> {
        let key = match key {
            V::Str(s) => s,
            _ => return None,
        };
        self.get_str(key)
    }

    pub fn get_str(&self, key: &Str) -> Option<V> {
        let mut cur = Some(self);
        while let Some(form) = cur {
            if let Some(v) = form.table.get(key) {
                return Some(v);
            }
            cur = form.next.as_deref();
        }
        None
    }

    pub fn must_get(&self, key: &V) -> Result<V> {
        match key {
            V::Str(s) => self.get_str(s).ok_or_else(|| not_found(s.as_str())),
            _ => Err(not_found("key")),
        }
    }

    pub fn put_impure(&self, key: Arc<Str>, value: V) -> bool {
        self.table.put_impure(key, value)
    }

    /// A new workspace layer over this one.
    pub fn extend(self: &Arc<Self>) -> Arc<GForm> {
        GForm::new(Arc::new(GTable::new()), Some(self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::getsym;

    #[test]
    fn put_and_get() {
        let t = GTable::new();
        assert!(t.put_impure(getsym("a"), V::Real(1.0)));
        assert!(t.put_impure(getsym("b"), V::Real(2.0)));
        assert!(!t.put_impure(getsym("a"), V::Real(3.0)));
        assert_eq!(t.get(&getsym("a")).unwrap().to_float_lossy(), 3.0);
        assert_eq!(t.get(&getsym("b")).unwrap().to_float_lossy(), 2.0);
        assert!(t.get(&getsym("c")).is_none());
    }

    #[test]
    fn pure_put_leaves_original_untouched() {
        let t = GTable::new();
        t.put_impure(getsym("x"), V::Real(1.0));
        let t2 = t.put_pure(getsym("x"), V::Real(9.0));
        assert_eq!(t.get(&getsym("x")).unwrap().to_float_lossy(), 1.0);
        assert_eq!(t2.get(&getsym("x")).unwrap().to_float_lossy(), 9.0);
    }

    #[test]
    fn sorted_is_definition_order() {
        let t = GTable::new();
        for name in ["zebra", "apple", "mango"] {
            t.put_impure(getsym(name), V::Real(0.0));
        }
        let names: Vec<String> = t
            .sorted()
            .into_iter()
            .map(|(k, _)| k.as_str().to_string())
            .collect();
        assert_eq!(names, vec!["zebra", "apple", "mango"]);
    }

    #[test]
    fn workspace_chain_shadows() {
        let base = GForm::fresh();
        base.put_impure(getsym("freq"), V::Real(440.0));
        let layer = base.extend();
        assert_eq!(layer.get_str(&getsym("freq")).unwrap().to_float_lossy(), 440.0);
        layer.put_impure(getsym("freq"), V::Real(220.0));
        assert_eq!(layer.get_str(&getsym("freq")).unwrap().to_float_lossy(), 220.0);
        assert_eq!(base.get_str(&getsym("freq")).unwrap().to_float_lossy(), 440.0);
    }
}
