//! Value and list semantics: finiteness, equality, feedback cells.

use std::sync::Arc;

use sapf::input::ZIn;
use sapf::parser::compile;
use sapf::value::{Plug, V, ZRef};
use sapf::vm::Thread;

fn eval(th: &mut Thread, source: &str) -> V {
    let fun = compile(th, source).unwrap();
    th.call_fun(&fun).unwrap();
    th.pop().unwrap()
}

#[test]
fn finiteness_propagates_through_math() {
    let mut th = Thread::for_tests();
    // an endless series bounded by a finite one ends with the finite one
    let v = eval(&mut th, "0 1 byz #[10 20 30] +");
    assert!(v.is_finite());
    let mut zin = ZIn::new(v);
    let mut got = Vec::new();
    while let Some(z) = zin.onez(&mut th).unwrap() {
        got.push(z);
    }
    assert_eq!(got, vec![10.0, 21.0, 32.0]);
}

#[test]
fn scalars_are_indefinite_sequences() {
    assert!(!V::Real(3.0).is_finite());
    let mut th = Thread::for_tests();
    let v = eval(&mut th, "[1 2 3]");
    assert!(v.is_finite());
    let v = eval(&mut th, "[1 2 3] cyc");
    assert!(!v.is_finite());
}

#[test]
fn lazy_and_packed_lists_compare_equal() {
    let mut th = Thread::for_tests();
    let a = eval(&mut th, "3 1 1 nbyz");
    let b = eval(&mut th, "#[1 2 3]");
    assert!(a.equals(&mut th, &b).unwrap());
    let c = eval(&mut th, "#[1 2 4]");
    assert!(!a.equals(&mut th, &c).unwrap());
}

#[test]
fn length_of_values() {
    let mut th = Thread::for_tests();
    let v = eval(&mut th, "[1 2 3] 2 ncyc");
    assert_eq!(v.length(&mut th).unwrap(), 6);
    assert_eq!(V::Real(1.0).length(&mut th).unwrap(), 1);
    assert_eq!(eval(&mut th, "[4 5 6] len").to_float_lossy(), 3.0);
}

#[test]
fn zref_reads_through() {
    let r = Arc::new(ZRef::new(2.5));
    let v = V::ZRef(r.clone());
    assert_eq!(v.to_float_lossy(), 2.5);
    r.set(7.0);
    assert_eq!(v.deref().to_float_lossy(), 7.0);
}

#[test]
fn plug_updates_bump_the_change_count() {
    let plug = Plug::new(V::Real(1.0));
    let (_, c0) = plug.load();
    plug.set(V::Real(2.0));
    let (cursor, c1) = plug.load();
    assert_ne!(c0, c1);
    // a consumer writing its cursor back under a stale count loses
    plug.set(V::Real(3.0));
    plug.store(cursor, c1);
    let (_, c2) = plug.load();
    assert_ne!(c1, c2);
}

#[test]
fn forked_threads_share_the_workspace() {
    let mut th = Thread::for_tests();
    let _ = eval(&mut th, "440 = freq freq");
    let mut audio = th.fork();
    let v = eval(&mut audio, "freq");
    assert_eq!(v.to_float_lossy(), 440.0);
}

#[test]
fn signal_literals_are_signals() {
    let mut th = Thread::for_tests();
    let v = eval(&mut th, "#[1 2 3]");
    assert!(v.is_zlist());
    let v = eval(&mut th, "[1 2 3]");
    assert!(v.is_vlist());
}

#[test]
fn coercions_between_carriers() {
    let mut th = Thread::for_tests();
    let v = eval(&mut th, "[1 2 3] z");
    assert!(v.is_zlist());
    let v = eval(&mut th, "#[1 2 3] v");
    assert!(v.is_vlist());
}

#[test]
fn print_respects_length_limit() {
    let mut th = Thread::for_tests();
    let v = eval(&mut th, "ord");
    let mut out = String::new();
    v.print(&mut th, &mut out, 0).unwrap();
    assert!(out.ends_with("...]"), "got {out}");
    assert!(out.len() < 1024);
}
