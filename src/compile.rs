//! Compile-time name resolution across nested scopes.
//!
//! Names resolve inside-out: lambda locals, then captured closure
//! variables (chained through every enclosing lambda), then workspace
//! bindings, then builtins. Parenthesised groups are transparent.

use std::sync::Arc;

use crate::fun::VarCap;
use crate::symbol::Str;
use crate::value::V;
use crate::vm::BUILTINS;
use crate::workspace::GForm;

/// Where a name was found.
pub enum Binding {
    Local(usize),
    Var(usize),
    Workspace(Arc<Str>),
    Builtin(V),
    Undefined,
}

/// Where a `=` definition lands.
pub enum BindTarget {
    Local(usize),
    Workspace(Arc<Str>),
}

/// One lambda scope under compilation.
pub struct InnerScope {
    pub locals: Vec<Arc<Str>>,
    pub vars: Vec<(Arc<Str>, VarCap)>,
}

/// The scope stack for one compilation unit. The top-level scope is
/// implicit: it tracks workspace names defined earlier in the same unit
/// so they resolve before they exist at runtime.
pub struct Compiler {
    inners: Vec<InnerScope>,
    top_defs: Vec<Arc<Str>>,
    workspace: Arc<GForm>,
}

fn position(names: &[Arc<Str>], name: &Str) -> Option<usize> {
    names
        .iter()
        .position(|n| n.hash() == name.hash() && n.as_str() == name.as_str())
}

impl Compiler {
    pub fn new(workspace: Arc<GForm>) -> Compiler {
        Compiler {
            inners: Vec::new(),
            top_defs: Vec::new(),
            workspace,
        }
    }

    pub fn push_inner(&mut self, arg_names: Vec<Arc<Str>>) {
        self.inners.push(InnerScope {
            locals: arg_names,
            vars: Vec::new(),
        });
    }

    pub fn pop_inner(&mut self) -> InnerScope {
        self.inners.pop().expect("scope stack underflow")
    }

    pub fn in_lambda(&self) -> bool {
        !self.inners.is_empty()
    }

    /// Resolve a referenced name, installing capture chains as needed.
    pub fn resolve(&mut self, name: &Arc<Str>) -> Binding {
        let mut found: Option<(usize, VarCap)> = None;
        for idx in (0..self.inners.len()).rev() {
            let sc = &self.inners[idx];
            if let Some(i) = position(&sc.locals, name) {
                found = Some((idx, VarCap::Local(i)));
                break;
            }
            if let Some(i) = sc.vars.iter().position(|(n, _)| n.as_str() == name.as_str()) {
                found = Some((idx, VarCap::Var(i)));
                break;
            }
        }
        if let Some((idx, source)) = found {
            if idx + 1 == self.inners.len() {
                return match source {
                    VarCap::Local(i) => Binding::Local(i),
                    VarCap::Var(i) => Binding::Var(i),
                };
            }
            // capture through every lambda between the definition and the
            // innermost scope; each level reads the previous one's slot
            let mut cap = source;
            let mut var_index = 0;
            for j in idx + 1..self.inners.len() {
                let sc = &mut self.inners[j];
                var_index = match sc.vars.iter().position(|(n, _)| n.as_str() == name.as_str()) {
                    Some(i) => i,
                    None => {
                        sc.vars.push((name.clone(), cap));
                        sc.vars.len() - 1
                    }
                };
                cap = VarCap::Var(var_index);
            }
            return Binding::Var(var_index);
        }
        if self
            .top_defs
            .iter()
            .any(|n| n.as_str() == name.as_str())
        {
            return Binding::Workspace(name.clone());
        }
        if self.workspace.get_str(name).is_some() {
            return Binding::Workspace(name.clone());
        }
        if let Some(v) = BUILTINS.get(name) {
            return Binding::Builtin(v);
        }
        Binding::Undefined
    }

    /// Install a `=` definition in the innermost scope.
    pub fn bind(&mut self, name: Arc<Str>) -> BindTarget {
        if let Some(sc) = self.inners.last_mut() {
            if let Some(i) = position(&sc.locals, &name) {
                return BindTarget::Local(i);
            }
            sc.locals.push(name);
            BindTarget::Local(sc.locals.len() - 1)
        } else {
            if !self.top_defs.iter().any(|n| n.as_str() == name.as_str()) {
                self.top_defs.push(name.clone());
            }
            BindTarget::Workspace(name)
        }
    }
}
