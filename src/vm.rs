//! The virtual machine: global configuration, the per-thread execution
//! state, and the opcode interpreter.

use lazy_static::lazy_static;
use std::sync::Arc;

use crate::array::{Array, ItemKind};
use crate::error::{wrong_type, Error, Result};
use crate::form::{Form, Table, TableMap};
use crate::fun::{Fun, Prim, PrimFn};
use crate::list::List;
use crate::opcode::{Code, Opcode};
use crate::random::{timeseed, RGen};
use crate::rate::Rate;
use crate::symbol::{getsym, Str};
use crate::value::{EachOp, V};
use crate::workspace::{GForm, GTable};

/// Interpreter-wide configuration, fixed once the program starts.
#[derive(Debug, Clone)]
pub struct Vm {
    /// Audio rate: the rate signal generators are built at by default.
    pub ar: Rate,
    /// Control rate.
    pub kr: Rate,
    /// Items per pull of a stream generator.
    pub v_block_size: usize,
    pub print_depth: usize,
    pub print_length: usize,
    pub print_total_items: usize,
    /// Target directory for recordings written without an explicit path.
    pub recordings_dir: Option<std::path::PathBuf>,
}

impl Default for Vm {
    fn default() -> Self {
        let ar = Rate::new(crate::DEFAULT_SAMPLE_RATE, crate::DEFAULT_Z_BLOCK_SIZE);
        let kr = Rate::new(
            crate::DEFAULT_SAMPLE_RATE / 4.0,
            crate::DEFAULT_CONTROL_BLOCK_SIZE,
        );
        Vm {
            ar,
            kr,
            v_block_size: crate::DEFAULT_V_BLOCK_SIZE,
            print_depth: 8,
            print_length: 64,
            print_total_items: 1024,
            recordings_dir: None,
        }
    }
}

impl Vm {
    pub fn with_sample_rate(sample_rate: f64) -> Self {
        let mut vm = Vm::default();
        vm.ar = Rate::new(sample_rate, crate::DEFAULT_Z_BLOCK_SIZE);
        vm.kr = Rate::new(sample_rate / 4.0, crate::DEFAULT_CONTROL_BLOCK_SIZE);
        vm
    }
}

lazy_static! {
    /// The global built-ins table, filled once by the op catalogs.
    pub static ref BUILTINS: GTable = {
        let t = GTable::new();
        crate::core_ops::install(&t);
        crate::math::install(&t);
        crate::stream_ops::install(&t);
        crate::random::install(&t);
        crate::write::install(&t);
        #[cfg(feature = "audio")]
        crate::play::install(&t);
        t
    };
}

/// Per-thread execution state: data stack, locals, current closure,
/// workspace, rate and random generator.
pub struct Thread {
    pub vm: Arc<Vm>,
    pub rate: Rate,
    pub rgen: RGen,
    pub workspace: Arc<GForm>,
    stack: Vec<V>,
    stack_base: usize,
    paren_bases: Vec<usize>,
    gather_bases: Vec<usize>,
    local: Vec<V>,
    local_base: usize,
    fun: Option<Arc<Fun>>,
}

impl Thread {
    pub fn new(vm: Arc<Vm>) -> Thread {
        let rate = vm.ar;
        Thread {
            vm,
            rate,
            rgen: RGen::from_seed(timeseed()),
            workspace: GForm::fresh(),
            stack: Vec::new(),
            stack_base: 0,
            paren_bases: Vec::new(),
            gather_bases: Vec::new(),
            local: Vec::new(),
            local_base: 0,
            fun: None,
        }
    }

    /// A thread with default configuration; unit tests use this.
    pub fn for_tests() -> Thread {
        Thread::new(Arc::new(Vm::default()))
    }

    /// A fresh thread sharing this one's configuration and workspace.
    /// The playback sink runs the audio side on a fork.
    pub fn fork(&self) -> Thread {
        Thread {
            vm: self.vm.clone(),
            rate: self.rate,
            rgen: RGen::from_seed(timeseed()),
            workspace: self.workspace.clone(),
            stack: Vec::new(),
            stack_base: 0,
            paren_bases: Vec::new(),
            gather_bases: Vec::new(),
            local: Vec::new(),
            local_base: 0,
            fun: None,
        }
    }

    // --- stack ---

    pub fn push(&mut self, v: V) -> Result<()> {
        if self.stack.len() >= crate::STACK_SIZE {
            return Err(Error::StackOverflow);
        }
        self.stack.push(v);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<V> {
        if self.stack.len() <= self.stack_base {
            return Err(Error::StackUnderflow);
        }
        Ok(self.stack.pop().unwrap())
    }

    pub fn top(&self) -> Result<&V> {
        if self.stack.len() <= self.stack_base {
            return Err(Error::StackUnderflow);
        }
        Ok(self.stack.last().unwrap())
    }

    /// The item `n` below the top (0 is the top itself).
    pub fn pick(&self, n: usize) -> Result<V> {
        if self.depth() <= n {
            return Err(Error::StackUnderflow);
        }
        Ok(self.stack[self.stack.len() - 1 - n].clone())
    }

    pub fn depth(&self) -> usize {
        self.stack.len() - self.stack_base
    }

    pub fn pop_n(&mut self, n: usize) -> Result<Vec<V>> {
        if self.depth() < n {
            return Err(Error::StackUnderflow);
        }
        let at = self.stack.len() - n;
        Ok(self.stack.drain(at..).collect())
    }

    pub fn clear_stack(&mut self) {
        self.stack.truncate(self.stack_base);
    }

    /// The visible stack contents, bottom first.
    pub fn stack_items(&self) -> &[V] {
        &self.stack[self.stack_base..]
    }

    // --- typed pops with context strings ---

    pub fn pop_float(&mut self, msg: &str) -> Result<f64> {
        self.pop()?.as_float(msg)
    }

    pub fn pop_int(&mut self, msg: &str) -> Result<i64> {
        self.pop()?.as_int(msg)
    }

    pub fn pop_string(&mut self, msg: &str) -> Result<Arc<Str>> {
        match self.pop()? {
            V::Str(s) => Ok(s),
            other => Err(wrong_type(msg, "String", other.type_name())),
        }
    }

    pub fn pop_list(&mut self, msg: &str) -> Result<Arc<List>> {
        match self.pop()? {
            V::List(list) => Ok(list),
            other => Err(wrong_type(msg, "List", other.type_name())),
        }
    }

    pub fn pop_vlist(&mut self, msg: &str) -> Result<Arc<List>> {
        match self.pop()? {
            V::List(list) if list.kind() == ItemKind::V => Ok(list),
            other => Err(wrong_type(msg, "VList", other.type_name())),
        }
    }

    pub fn pop_zlist(&mut self, msg: &str) -> Result<Arc<List>> {
        match self.pop()? {
            V::List(list) if list.kind() == ItemKind::Z => Ok(list),
            other => Err(wrong_type(msg, "ZList", other.type_name())),
        }
    }

    /// Anything a signal cursor accepts: a real or a signal list.
    pub fn pop_zin(&mut self, msg: &str) -> Result<V> {
        let v = self.pop()?;
        if v.is_zin() {
            Ok(v)
        } else {
            Err(wrong_type(msg, "Real or ZList", v.type_name()))
        }
    }

    pub fn pop_form(&mut self, msg: &str) -> Result<Arc<Form>> {
        match self.pop()? {
            V::Form(form) => Ok(form),
            other => Err(wrong_type(msg, "Form", other.type_name())),
        }
    }

    pub fn pop_fun(&mut self, msg: &str) -> Result<V> {
        let v = self.pop()?;
        if v.is_fun_or_prim() {
            Ok(v)
        } else {
            Err(wrong_type(msg, "Fun or Prim", v.type_name()))
        }
    }

    // --- locals and closure vars ---

    pub fn local(&self, i: usize) -> V {
        self.local.get(self.local_base + i).cloned().unwrap_or_default()
    }

    pub fn fun_var(&self, i: usize) -> V {
        self.fun
            .as_ref()
            .and_then(|f| f.vars.get(i).cloned())
            .unwrap_or_default()
    }

    pub fn current_workspace(&self) -> Arc<GForm> {
        match &self.fun {
            Some(fun) => fun.workspace.clone(),
            None => self.workspace.clone(),
        }
    }

    // --- execution ---

    /// Run a closure: move its arguments into fresh local slots, execute
    /// its code, restore the frame.
    pub fn call_fun(&mut self, fun: &Arc<Fun>) -> Result<()> {
        let def = fun.def.clone();
        if self.depth() < def.num_args {
            return Err(Error::StackUnderflow);
        }
        let save_local_base = self.local_base;
        let save_fun = self.fun.take();
        self.local_base = self.local.len();
        let at = self.stack.len() - def.num_args;
        self.local.extend(self.stack.drain(at..));
        self.local
            .resize(self.local_base + def.num_locals.max(def.num_args), V::default());
        self.fun = Some(fun.clone());
        let result = self.run(&def.code);
        self.local.truncate(self.local_base);
        self.local_base = save_local_base;
        self.fun = save_fun;
        result
    }

    /// Run with the stack base moved up so the callee sees only its `n`
    /// arguments; anything left above the base is cleared on exit.
    pub fn with_saved_stack<R>(
        &mut self,
        n: usize,
        f: impl FnOnce(&mut Thread) -> Result<R>,
    ) -> Result<R> {
        if self.depth() < n {
            return Err(Error::StackUnderflow);
        }
        let save = self.stack_base;
        self.stack_base = self.stack.len() - n;
        let result = f(self);
        self.stack.truncate(self.stack_base);
        self.stack_base = save;
        result
    }

    /// Push `args`, apply `f`, and collect its left values.
    pub fn apply_with(&mut self, f: &V, args: Vec<V>) -> Result<Vec<V>> {
        let leaves = f.leaves();
        self.with_saved_stack(0, |th| {
            for a in args {
                th.push(a)?;
            }
            crate::automap::apply_call(th, f)?;
            th.pop_n(leaves)
        })
    }

    fn apply_if_fun(&mut self, v: V) -> Result<()> {
        if v.is_fun_or_prim() {
            v.apply(self)
        } else {
            self.push(v)
        }
    }

    /// The opcode interpreter.
    pub fn run(&mut self, code: &Code) -> Result<()> {
        for op in &code.ops {
            match op {
                Opcode::PushImm(v) => self.push(v.clone())?,
                Opcode::PushLocal(i) => {
                    let v = self.local(*i);
                    self.push(v)?;
                }
                Opcode::PushVar(i) => {
                    let v = self.fun_var(*i);
                    self.push(v)?;
                }
                Opcode::PushWorkspace(name) => {
                    let v = self.current_workspace().must_get(&V::Str(name.clone()))?;
                    self.push(v)?;
                }
                Opcode::CallImm(v) => v.apply(self)?,
                Opcode::CallLocal(i) => {
                    let v = self.local(*i);
                    self.apply_if_fun(v)?;
                }
                Opcode::CallVar(i) => {
                    let v = self.fun_var(*i);
                    self.apply_if_fun(v)?;
                }
                Opcode::CallWorkspace(name) => {
                    let v = self.current_workspace().must_get(&V::Str(name.clone()))?;
                    self.apply_if_fun(v)?;
                }
                Opcode::Apply => {
                    let v = self.pop()?;
                    v.apply(self)?;
                }
                Opcode::Comma(key) => {
                    let v = self.pop()?;
                    let out = v.comma(self, &V::Str(key.clone()))?;
                    self.push(out)?;
                }
                Opcode::Dot(key) => {
                    let v = self.pop()?;
                    let out = v.dot(self, &V::Str(key.clone()))?;
                    self.push(out)?;
                }
                Opcode::BindLocal(i) => {
                    let v = self.pop()?;
                    let slot = self.local_base + *i;
                    if self.local.len() <= slot {
                        self.local.resize(slot + 1, V::default());
                    }
                    self.local[slot] = v;
                }
                Opcode::BindWorkspace(name) => {
                    let v = self.pop()?;
                    self.current_workspace().put_impure(name.clone(), v);
                }
                Opcode::MakeFun(def) => {
                    let fun = Fun::bind(self, def);
                    self.push(V::Fun(fun))?;
                }
                Opcode::BeginGather => {
                    self.gather_bases.push(self.stack.len());
                }
                Opcode::EndVList => {
                    let base = self.gather_bases.pop().unwrap_or(self.stack_base);
                    let base = base.min(self.stack.len());
                    let items: Vec<V> = self.stack.drain(base..).collect();
                    let mut array = Array::with_capacity(ItemKind::V, items.len());
                    for item in items {
                        array.push(item);
                    }
                    self.push(V::List(List::packed(array)))?;
                }
                Opcode::EndZList => {
                    let base = self.gather_bases.pop().unwrap_or(self.stack_base);
                    let base = base.min(self.stack.len());
                    let items: Vec<V> = self.stack.drain(base..).collect();
                    let mut array = Array::with_capacity(ItemKind::Z, items.len());
                    for item in items {
                        array.pushz(item.as_float("signal literal : item")?);
                    }
                    self.push(V::List(List::packed(array)))?;
                }
                Opcode::MakeForm(keys) => {
                    let base = self.gather_bases.pop().unwrap_or(self.stack_base);
                    let base = base.min(self.stack.len());
                    let values: Vec<V> = self.stack.drain(base..).collect();
                    if values.len() != keys.len() {
                        return Err(Error::Failed(
                            "form literal : one value per key".to_string(),
                        ));
                    }
                    let map = TableMap::new(keys.as_ref().clone());
                    let table = Table::new(map, values);
                    let form = Form::new(table, Vec::new())?;
                    self.push(V::Form(form))?;
                }
                Opcode::BeginParen => {
                    self.paren_bases.push(self.stack_base);
                    self.stack_base = self.stack.len();
                }
                Opcode::EndParen => {
                    if let Some(base) = self.paren_bases.pop() {
                        self.stack_base = base;
                    }
                }
                Opcode::Drop => {
                    self.pop()?;
                }
                Opcode::Each(depth) => {
                    let v = self.pop()?;
                    let wrapped = match v {
                        V::Each(e) => EachOp::new(e.v.clone(), e.depth + depth),
                        other => EachOp::new(other, *depth),
                    };
                    self.push(V::Each(Arc::new(wrapped)))?;
                }
            }
        }
        Ok(())
    }

    /// Render the visible stack, top last, for the REPL.
    pub fn print_stack(&mut self) -> Result<String> {
        let items: Vec<V> = self.stack_items().to_vec();
        let mut out = String::new();
        for (i, v) in items.iter().enumerate() {
            if i > 0 {
                out.push(' ');
            }
            v.print(self, &mut out, 0)?;
        }
        Ok(out)
    }
}

// --- builtin registration helpers ---

const K_MASKS: [&str; 8] = ["k", "kk", "kkk", "kkkk", "kkkkk", "kkkkkk", "kkkkkkk", "kkkkkkkk"];

/// Register a plain builtin.
pub fn def(
    t: &GTable,
    name: &'static str,
    takes: u16,
    leaves: u16,
    func: PrimFn,
    help: &'static str,
) {
    t.put_impure(
        getsym(name),
        V::Prim(Arc::new(Prim {
            func,
            v: V::Real(0.0),
            name,
            help,
            takes,
            leaves,
            mask: None,
            no_each: false,
        })),
    );
}

/// Register a builtin whose arguments never auto-map.
pub fn def_no_each(
    t: &GTable,
    name: &'static str,
    takes: u16,
    leaves: u16,
    func: PrimFn,
    help: &'static str,
) {
    t.put_impure(
        getsym(name),
        V::Prim(Arc::new(Prim {
            func,
            v: V::Real(0.0),
            name,
            help,
            takes,
            leaves,
            mask: None,
            no_each: true,
        })),
    );
}

/// Register a builtin with an explicit automap mask; one mask character
/// per argument.
pub fn def_automap(
    t: &GTable,
    name: &'static str,
    mask: &'static str,
    func: PrimFn,
    help: &'static str,
) {
    t.put_impure(
        getsym(name),
        V::Prim(Arc::new(Prim {
            func,
            v: V::Real(0.0),
            name,
            help,
            takes: mask.len() as u16,
            leaves: 1,
            mask: Some(mask),
            no_each: false,
        })),
    );
}

/// Register a multichannel-expanded builtin: every argument expects a
/// scalar and lifts over lists.
pub fn def_mcx(t: &GTable, name: &'static str, num_args: usize, func: PrimFn, help: &'static str) {
    def_automap(t, name, K_MASKS[num_args - 1], func, help);
}

/// Register a constant.
pub fn def_const(t: &GTable, name: &str, value: V) {
    t.put_impure(getsym(name), value);
}
