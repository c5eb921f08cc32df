//! Compiled functions and built-in primitives.

use std::sync::Arc;

use crate::error::Result;
use crate::opcode::Code;
use crate::symbol::Str;
use crate::value::V;
use crate::vm::Thread;
use crate::workspace::GForm;

/// Where a closure variable's value comes from at capture time, relative
/// to the enclosing frame.
#[derive(Debug, Clone, Copy)]
pub enum VarCap {
    /// A local (or argument) of the enclosing function.
    Local(usize),
    /// A closure variable of the enclosing function.
    Var(usize),
}

/// A compiled lambda: shared opcode stream plus arities and capture
/// descriptors. One def is shared by every closure made from it.
#[derive(Debug)]
pub struct FunDef {
    pub code: Arc<Code>,
    pub num_args: usize,
    pub num_locals: usize,
    pub arg_names: Vec<Arc<Str>>,
    pub caps: Vec<VarCap>,
    pub leaves: usize,
    pub help: Option<String>,
}

impl FunDef {
    pub fn new(
        code: Arc<Code>,
        num_args: usize,
        num_locals: usize,
        arg_names: Vec<Arc<Str>>,
        caps: Vec<VarCap>,
        leaves: usize,
    ) -> Arc<FunDef> {
        Arc::new(FunDef {
            code,
            num_args,
            num_locals,
            arg_names,
            caps,
            leaves,
            help: None,
        })
    }
}

/// A closure: a def plus the captured variables and the workspace in
/// effect when it was made.
#[derive(Debug)]
pub struct Fun {
    pub def: Arc<FunDef>,
    pub vars: Vec<V>,
    pub workspace: Arc<GForm>,
}

impl Fun {
    /// Capture closure variables from the current frame.
    pub fn bind(th: &Thread, def: &Arc<FunDef>) -> Arc<Fun> {
        let vars = def
            .caps
            .iter()
            .map(|cap| match *cap {
                VarCap::Local(i) => th.local(i),
                VarCap::Var(i) => th.fun_var(i),
            })
            .collect();
        Arc::new(Fun {
            def: def.clone(),
            vars,
            workspace: th.current_workspace(),
        })
    }

    pub fn num_args(&self) -> usize {
        self.def.num_args
    }

    pub fn num_locals(&self) -> usize {
        self.def.num_locals
    }

    pub fn leaves(&self) -> usize {
        self.def.leaves
    }
}

/// The body of a built-in.
pub type PrimFn = fn(&mut Thread, &Prim) -> Result<()>;

/// A built-in primitive: a function pointer, its declared stack effect,
/// an optional automap mask over its arguments, and one line of help.
pub struct Prim {
    pub func: PrimFn,
    /// Optional payload for families of prims sharing one body.
    pub v: V,
    pub name: &'static str,
    pub help: &'static str,
    pub takes: u16,
    pub leaves: u16,
    pub mask: Option<&'static str>,
    pub no_each: bool,
}

impl std::fmt::Debug for Prim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prim")
            .field("name", &self.name)
            .field("takes", &self.takes)
            .field("leaves", &self.leaves)
            .field("mask", &self.mask)
            .finish_non_exhaustive()
    }
}

impl Prim {
    pub fn new(
        func: PrimFn,
        name: &'static str,
        takes: u16,
        leaves: u16,
        help: &'static str,
    ) -> Arc<Prim> {
        Arc::new(Prim {
            func,
            v: V::Real(0.0),
            name,
            help,
            takes,
            leaves,
            mask: None,
            no_each: false,
        })
    }
}
