//! Stack shuffles, records, references and control.

use std::sync::Arc;

use crate::error::{wrong_type, Error, Result};
use crate::form::Form;
use crate::value::{Plug, Ref, V, ZPlug, ZRef};
use crate::vm::{def, def_automap, def_const, def_no_each, Thread, BUILTINS};
use crate::workspace::GTable;

type Prim = crate::fun::Prim;

// --- stack ---

fn dup_(th: &mut Thread, _: &Prim) -> Result<()> {
    let a = th.top()?.clone();
    th.push(a)
}

fn over_(th: &mut Thread, _: &Prim) -> Result<()> {
    let a = th.pick(1)?;
    th.push(a)
}

fn swap_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    let a = th.pop()?;
    th.push(b)?;
    th.push(a)
}

fn nip_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    th.pop()?;
    th.push(b)
}

fn tuck_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    let a = th.pop()?;
    th.push(b.clone())?;
    th.push(a)?;
    th.push(b)
}

fn rot_(th: &mut Thread, _: &Prim) -> Result<()> {
    let c = th.pop()?;
    let b = th.pop()?;
    let a = th.pop()?;
    th.push(b)?;
    th.push(c)?;
    th.push(a)
}

fn drop_(th: &mut Thread, _: &Prim) -> Result<()> {
    th.pop()?;
    Ok(())
}

fn pick_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("pick : n")?;
    if n < 0 {
        return Err(Error::OutOfRange("pick : n".to_string()));
    }
    let v = th.pick(n as usize)?;
    th.push(v)
}

fn clear_(th: &mut Thread, _: &Prim) -> Result<()> {
    th.clear_stack();
    Ok(())
}

fn stack_(th: &mut Thread, _: &Prim) -> Result<()> {
    let s = th.print_stack()?;
    println!("stack : {s}");
    Ok(())
}

fn pr_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    let mut out = String::new();
    v.print(th, &mut out, 0)?;
    println!("{out}");
    Ok(())
}

fn quit_(_th: &mut Thread, _: &Prim) -> Result<()> {
    Err(Error::UserQuit)
}

fn help_(th: &mut Thread, _: &Prim) -> Result<()> {
    println!("argument automapping legend:");
    println!("   a - as is. the argument is not automapped.");
    println!("   z - expects a signal or scalar; streams automap.");
    println!("   k - expects a scalar; signals and streams automap.");
    println!();
    for (name, value) in BUILTINS.sorted() {
        match &value {
            V::Prim(p) => match p.mask {
                Some(mask) => println!("{} @{} {}", name.as_str(), mask, p.help),
                None => println!("{} {}", name.as_str(), p.help),
            },
            other => {
                let mut out = String::new();
                other.print(th, &mut out, 0)?;
                println!("{} = {}", name.as_str(), out);
            }
        }
    }
    Ok(())
}

// --- predicates and comparison ---

fn eq_(th: &mut Thread, _: &Prim) -> Result<()> {
    let b = th.pop()?;
    let a = th.pop()?;
    let same = a.equals(th, &b)?;
    th.push(V::Real(if same { 1.0 } else { 0.0 }))
}

fn is_finite_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(V::Real(if v.is_finite() { 1.0 } else { 0.0 }))
}

fn type_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(V::Str(crate::symbol::getsym(v.type_name())))
}

fn noeach_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    v.set_no_each();
    th.push(v)
}

fn workspace_(th: &mut Thread, _: &Prim) -> Result<()> {
    let ws = th.current_workspace();
    th.push(V::GForm(ws))
}

// --- control ---

fn if_(th: &mut Thread, _: &Prim) -> Result<()> {
    let else_branch = th.pop()?;
    let then_branch = th.pop()?;
    let cond = th.pop()?;
    let chosen = if cond.is_true() { then_branch } else { else_branch };
    if chosen.is_fun_or_prim() {
        chosen.apply(th)
    } else {
        th.push(chosen)
    }
}

fn do_(th: &mut Thread, _: &Prim) -> Result<()> {
    let f = th.pop_fun("do : fun")?;
    let seq = th.pop()?;
    let mut input = crate::input::BothIn::new_once(seq);
    while let Some(x) = input.one(th)? {
        let _ = th.apply_with(&f, vec![x])?;
    }
    Ok(())
}

// --- indexing ---

fn at_(th: &mut Thread, _: &Prim) -> Result<()> {
    let i = th.pop_int("at : index")?;
    let v = th.pop()?;
    let v = match v {
        V::List(list) => V::List(list.pack(th)?),
        other => other,
    };
    th.push(v.at(i))
}

fn atw_(th: &mut Thread, _: &Prim) -> Result<()> {
    let i = th.pop_int("atw : index")?;
    let v = th.pop()?;
    let v = match v {
        V::List(list) => V::List(list.pack(th)?),
        other => other,
    };
    th.push(v.wrap_at(i))
}

fn atc_(th: &mut Thread, _: &Prim) -> Result<()> {
    let i = th.pop_int("atc : index")?;
    let v = th.pop()?;
    let v = match v {
        V::List(list) => V::List(list.pack(th)?),
        other => other,
    };
    th.push(v.clip_at(i))
}

fn atf_(th: &mut Thread, _: &Prim) -> Result<()> {
    let i = th.pop_int("atf : index")?;
    let v = th.pop()?;
    let v = match v {
        V::List(list) => V::List(list.pack(th)?),
        other => other,
    };
    th.push(v.fold_at(i))
}

// --- records ---

fn inherit_(th: &mut Thread, _: &Prim) -> Result<()> {
    let child = th.pop_form("inherit : form")?;
    let parents = th.pop()?;
    let parents = match parents {
        V::Form(form) => vec![form],
        V::List(list) => {
            let packed = list.pack(th)?;
            let array = packed
                .array()
                .ok_or(Error::Internal("inherit : unpacked".to_string()))?;
            let mut out = Vec::with_capacity(array.len());
            for i in 0..array.len() as i64 {
                match array.at(i) {
                    V::Form(form) => out.push(form),
                    other => {
                        return Err(wrong_type("inherit : parent", "Form", other.type_name()))
                    }
                }
            }
            out
        }
        other => return Err(wrong_type("inherit : parents", "Form or List", other.type_name())),
    };
    let form = Form::new(child.table().clone(), parents)?;
    th.push(V::Form(form))
}

// --- references and feedback ---

fn ref_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(V::Ref(Arc::new(Ref::new(v))))
}

fn zref_(th: &mut Thread, _: &Prim) -> Result<()> {
    let z = th.pop_float("zref : value")?;
    th.push(V::ZRef(Arc::new(ZRef::new(z))))
}

fn plug_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(V::Plug(Arc::new(Plug::new(v))))
}

fn zplug_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop_zin("zplug : value")?;
    th.push(V::ZPlug(Arc::new(ZPlug::new(v))))
}

fn value_(th: &mut Thread, _: &Prim) -> Result<()> {
    let v = th.pop()?;
    th.push(v.deref())
}

fn set_(th: &mut Thread, _: &Prim) -> Result<()> {
    let value = th.pop()?;
    let target = th.pop()?;
    match &target {
        V::Ref(r) => r.set(value),
        V::ZRef(r) => r.set(value.as_float("set : value")?),
        V::Plug(p) => p.set(value),
        V::ZPlug(p) => p.set(value),
        other => return Err(wrong_type("set : ref", "Ref, ZRef or Plug", other.type_name())),
    }
    Ok(())
}

fn chase_(th: &mut Thread, _: &Prim) -> Result<()> {
    let n = th.pop_int("chase : n")?;
    let v = th.pop()?;
    let out = v.chase(th, n)?;
    th.push(out)
}

pub fn install(t: &GTable) {
    def_const(t, "nilv", V::List(crate::list::List::nil(crate::array::ItemKind::V)));
    def_const(t, "nilz", V::List(crate::list::List::nil(crate::array::ItemKind::Z)));

    def_no_each(t, "dup", 1, 2, dup_, "(a --> a a) duplicate the top of stack.");
    def_no_each(t, "over", 2, 3, over_, "(a b --> a b a) copy the second item to the top.");
    def_no_each(t, "swap", 2, 2, swap_, "(a b --> b a) exchange the top two items.");
    def_no_each(t, "nip", 2, 1, nip_, "(a b --> b) drop the second item.");
    def_no_each(t, "tuck", 2, 3, tuck_, "(a b --> b a b) copy the top below the second item.");
    def_no_each(t, "rot", 3, 3, rot_, "(a b c --> b c a) rotate the third item to the top.");
    def_no_each(t, "drop", 1, 0, drop_, "(a --> ) discard the top of stack.");
    def_no_each(t, "pick", 1, 1, pick_, "(n --> x) copy the item n below the top.");
    def(t, "clear", 0, 0, clear_, "( --> ) empty the stack.");
    def(t, "stack", 0, 0, stack_, "( --> ) print the stack.");
    def_no_each(t, "pr", 1, 0, pr_, "(v --> ) print a value.");
    def(t, "quit", 0, 0, quit_, "( --> ) leave the interpreter.");
    def(t, "help", 0, 0, help_, "( --> ) list the built in words.");

    def_no_each(t, "eq", 2, 1, eq_, "(a b --> bool) structural equality.");
    def_no_each(t, "finite?", 1, 1, is_finite_, "(v --> bool) is the value a finite sequence.");
    def_no_each(t, "type", 1, 1, type_, "(v --> symbol) the type name of a value.");
    def_no_each(t, "noeach", 1, 1, noeach_, "(v --> v) opt a value out of automapping.");
    def(t, "workspace", 0, 1, workspace_, "( --> ws) the current workspace.");

    def_no_each(t, "if", 3, 1, if_, "(bool then else --> ...) apply then or else.");
    def_no_each(t, "do", 2, 0, do_, "(in fun --> ) apply a fun to each item for its effects.");

    def_automap(t, "at", "ak", at_, "(list i --> item) index; zero outside the bounds.");
    def_automap(t, "atw", "ak", atw_, "(list i --> item) index, wrapping modulo the length.");
    def_automap(t, "atc", "ak", atc_, "(list i --> item) index, clamped to the ends.");
    def_automap(t, "atf", "ak", atf_, "(list i --> item) index, reflecting off the ends.");

    def(t, "inherit", 2, 1, inherit_, "(parents form --> form) a form inheriting from parents.");

    def(t, "ref", 1, 1, ref_, "(v --> ref) a mutable holder of one value.");
    def(t, "zref", 1, 1, zref_, "(x --> zref) a mutable holder of one sample.");
    def(t, "plug", 1, 1, plug_, "(v --> plug) a replaceable stream input for feedback.");
    def(t, "zplug", 1, 1, zplug_, "(v --> zplug) a replaceable signal input for feedback.");
    def(t, "value", 1, 1, value_, "(ref --> v) read through a reference.");
    def_no_each(t, "set", 2, 0, set_, "(ref v --> ) store into a reference or plug.");
    def(t, "chase", 2, 1, chase_, "(v n --> v) force n items of progress on a held sequence.");
}
