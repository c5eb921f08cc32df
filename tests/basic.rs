//! End to end language tests: compile a line, run it, inspect the stack.

use std::sync::Arc;

use sapf::input::BothIn;
use sapf::parser::compile;
use sapf::value::V;
use sapf::vm::{Thread, Vm};

fn run(th: &mut Thread, source: &str) {
    let fun = compile(th, source).unwrap_or_else(|e| panic!("compile {source:?}: {e}"));
    th.call_fun(&fun)
        .unwrap_or_else(|e| panic!("run {source:?}: {e}"));
}

/// Run a line and collect the resulting value's items as floats.
fn eval_floats(source: &str) -> Vec<f64> {
    let mut th = Thread::for_tests();
    run(&mut th, source);
    let v = th.pop().unwrap();
    collect_floats(&mut th, v)
}

fn collect_floats(th: &mut Thread, v: V) -> Vec<f64> {
    match v {
        V::Real(f) => vec![f],
        V::List(_) => {
            let mut input = BothIn::new(v);
            let mut out = Vec::new();
            while let Some(z) = input.onez(th).unwrap() {
                out.push(z);
                assert!(out.len() < 1_000_000, "runaway sequence");
            }
            out
        }
        other => panic!("expected numbers, got {}", other.type_name()),
    }
}

#[test]
fn addition_leaves_sum() {
    assert_eq!(eval_floats("5 3 +"), vec![8.0]);
}

#[test]
fn finite_series_as_signal() {
    let mut th = Thread::for_tests();
    run(&mut th, "10 1 1 nbyz");
    let v = th.pop().unwrap();
    assert!(v.is_zlist());
    assert!(v.is_finite());
    let got = collect_floats(&mut th, v);
    assert_eq!(got, (1..=10).map(|i| i as f64).collect::<Vec<_>>());
}

#[test]
fn cycle_then_take() {
    assert_eq!(
        eval_floats("[1 2 3] cyc 7 N"),
        vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0, 1.0]
    );
}

#[test]
fn listwise_addition() {
    assert_eq!(eval_floats("[1 2 3] [10 20 30] +"), vec![11.0, 22.0, 33.0]);
}

#[test]
fn listwise_addition_stops_at_shorter() {
    assert_eq!(eval_floats("[1 2 3 4 5] [10 20] +"), vec![11.0, 22.0]);
}

#[test]
fn scalar_broadcasts_over_list() {
    assert_eq!(eval_floats("[1 2 3] 10 +"), vec![11.0, 12.0, 13.0]);
    assert_eq!(eval_floats("10 [1 2 3] -"), vec![9.0, 8.0, 7.0]);
}

#[test]
fn exponential_line_shape() {
    let vm = Vm::with_sample_rate(48000.0);
    let mut th = Thread::new(Arc::new(vm));
    run(&mut th, "5 .1 .9 xline");
    let v = th.pop().unwrap();
    assert!(v.is_zlist());
    let got = collect_floats(&mut th, v);
    assert_eq!(got.len(), 240000);
    assert!((got[0] - 0.1).abs() < 1e-9);
    assert!((got[got.len() - 1] - 0.9).abs() < 1e-3);
    for pair in got.windows(2) {
        assert!(pair[1] > pair[0], "not monotonic at {pair:?}");
    }
}

#[test]
fn reverse_and_reverse_again() {
    assert_eq!(eval_floats("[1 2 3 4] reverse"), vec![4.0, 3.0, 2.0, 1.0]);
    assert_eq!(
        eval_floats("[1 2 3 4] reverse reverse"),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn append_keeps_prefix_then_tail() {
    assert_eq!(eval_floats("[1 2] [3 4 5] $"), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(eval_floats("#[1 2] #[3 4] $z"), vec![1.0, 2.0, 3.0, 4.0]);
    // a scalar tail is a constant continuation
    assert_eq!(eval_floats("[1 2] 9 $ 5 N"), vec![1.0, 2.0, 9.0, 9.0, 9.0]);
}

#[test]
fn ncyc_is_k_repetitions() {
    assert_eq!(
        eval_floats("[1 2 3] 2 ncyc"),
        vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]
    );
    let mut th = Thread::for_tests();
    run(&mut th, "[1 2 3] 0 ncyc");
    let v = th.pop().unwrap();
    assert_eq!(collect_floats(&mut th, v), Vec::<f64>::new());
}

#[test]
fn definitions_and_lambdas() {
    let mut th = Thread::for_tests();
    run(&mut th, "3 = x x 2 +");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 5.0);

    let mut th = Thread::for_tests();
    run(&mut th, "{ |a b| a b + } = add2 3 4 add2");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 7.0);
}

#[test]
fn closures_capture_locals() {
    let mut th = Thread::for_tests();
    run(&mut th, "{ |a| { |b| a b + } } = adder 10 adder = add10 5 add10");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 15.0);
}

#[test]
fn explicit_each_lifts_a_lambda() {
    assert_eq!(eval_floats("[1 2 3] @ { |x| x x * } !"), vec![1.0, 4.0, 9.0]);
}

#[test]
fn automap_lifts_scalar_arguments() {
    // the start argument is a list, so the series itself is lifted
    let mut th = Thread::for_tests();
    run(&mut th, "2 [1 10] 1 nbyz");
    let v = th.pop().unwrap();
    assert!(v.is_vlist());
    let mut input = BothIn::new(v);
    let first = input.one(&mut th).unwrap().unwrap();
    let second = input.one(&mut th).unwrap().unwrap();
    assert!(input.one(&mut th).unwrap().is_none());
    assert_eq!(collect_floats(&mut th, first), vec![1.0, 2.0]);
    assert_eq!(collect_floats(&mut th, second), vec![10.0, 11.0]);
}

#[test]
fn forms_fetch_and_dot_call() {
    let mut th = Thread::for_tests();
    run(&mut th, "'{ a: 1 b: 2 } = f f ,a f ,b +");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 3.0);

    let mut th = Thread::for_tests();
    run(&mut th, "'{ x: 21 double: { |s| s ,x 2 * } } = obj obj .double");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 42.0);
}

#[test]
fn form_inheritance_shadows() {
    let mut th = Thread::for_tests();
    run(&mut th, "'{ a: 1 b: 2 } = base base '{ b: 20 } inherit = child");
    run(&mut th, "child ,a child ,b");
    let b = th.pop().unwrap().to_float_lossy();
    let a = th.pop().unwrap().to_float_lossy();
    assert_eq!(a, 1.0);
    assert_eq!(b, 20.0);
}

#[test]
fn reduce_and_scan() {
    assert_eq!(eval_floats("[1 2 3 4] 0 \\+ reduce"), vec![10.0]);
    assert_eq!(eval_floats("[1 2 3 4] 0 \\+ scan"), vec![1.0, 3.0, 6.0, 10.0]);
    assert_eq!(eval_floats("[1 2 3] 1 \\* reduce"), vec![6.0]);
}

#[test]
fn stack_words() {
    assert_eq!(eval_floats("1 2 swap -"), vec![1.0]);
    let mut th = Thread::for_tests();
    run(&mut th, "1 2 dup");
    assert_eq!(th.depth(), 3);
    run(&mut th, "; ;");
    assert_eq!(th.depth(), 1);
}

#[test]
fn errors_surface_the_taxonomy() {
    let mut th = Thread::for_tests();
    let fun = compile(&th, "[1 2 3] cyc pack").unwrap();
    match th.call_fun(&fun) {
        Err(sapf::Error::Indefinite(_)) => {}
        other => panic!("expected indefinite, got {other:?}"),
    }

    let mut th = Thread::for_tests();
    let fun = compile(&th, "+").unwrap();
    match th.call_fun(&fun) {
        Err(sapf::Error::StackUnderflow) => {}
        other => panic!("expected stack underflow, got {other:?}"),
    }

    match compile(&Thread::for_tests(), "nosuchword") {
        Err(sapf::Error::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn indexing_words() {
    assert_eq!(eval_floats("[10 20 30] 1 at"), vec![20.0]);
    assert_eq!(eval_floats("[10 20 30] 7 at"), vec![0.0]);
    assert_eq!(eval_floats("[10 20 30] 4 atw"), vec![20.0]);
    assert_eq!(eval_floats("[10 20 30] 9 atc"), vec![30.0]);
    assert_eq!(eval_floats("[10 20 30] 3 atf"), vec![20.0]);
}

#[test]
fn mirrors() {
    assert_eq!(eval_floats("[1 2 3] mirror"), vec![1.0, 2.0, 3.0, 2.0]);
    assert_eq!(eval_floats("[1 2 3] mirror1"), vec![1.0, 2.0, 3.0, 2.0, 1.0]);
    assert_eq!(
        eval_floats("[1 2 3] mirror2"),
        vec![1.0, 2.0, 3.0, 3.0, 2.0, 1.0]
    );
}

#[test]
fn refs_read_through_math() {
    let mut th = Thread::for_tests();
    run(&mut th, "5 ref = r r value 1 + r swap set r value");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 6.0);
}

#[test]
fn strings_concatenate() {
    let mut th = Thread::for_tests();
    run(&mut th, "\"pure \" \"form\" +");
    match th.pop().unwrap() {
        V::Str(s) => assert_eq!(s.as_str(), "pure form"),
        other => panic!("expected string, got {}", other.type_name()),
    }
}

#[test]
fn repeat_family() {
    assert_eq!(eval_floats("7 3 X"), vec![7.0, 7.0, 7.0]);
    assert_eq!(eval_floats("{ |i| i 10 * } 3 X"), vec![0.0, 10.0, 20.0]);
    assert_eq!(eval_floats("5 4 XZ"), vec![5.0, 5.0, 5.0, 5.0]);
}

#[test]
fn tuples_and_untuples() {
    assert_eq!(eval_floats("1 2 2ples"), vec![1.0, 2.0]);
    let mut th = Thread::for_tests();
    run(&mut th, "[1 2 3] un2 +");
    assert_eq!(th.pop().unwrap().to_float_lossy(), 3.0);
    // sequences pair up elementwise through automapping
    let mut th = Thread::for_tests();
    run(&mut th, "[1 2] [10 20] 2ples");
    let v = th.pop().unwrap();
    let mut input = BothIn::new(v);
    let first = input.one(&mut th).unwrap().unwrap();
    assert_eq!(collect_floats(&mut th, first), vec![1.0, 10.0]);
}

#[test]
fn ord_to_and_ranges() {
    assert_eq!(eval_floats("ord 5 N"), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    assert_eq!(eval_floats("3 7 to"), vec![3.0, 4.0, 5.0, 6.0, 7.0]);
    assert_eq!(eval_floats("7 3 to"), vec![7.0, 6.0, 5.0, 4.0, 3.0]);
    assert_eq!(eval_floats("5 0 1 lindivz"), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn skip_words() {
    assert_eq!(eval_floats("[1 2 3 4 5] 2 N>"), vec![3.0, 4.0, 5.0]);
    assert_eq!(eval_floats("ord 3 N> 2 N"), vec![4.0, 5.0]);
}

#[test]
fn flatten_one_level() {
    assert_eq!(
        eval_floats("[[1 2] [3] 4] flat"),
        vec![1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn conditionals_apply_branches() {
    assert_eq!(eval_floats("1 { 10 } { 20 } if"), vec![10.0]);
    assert_eq!(eval_floats("0 { 10 } { 20 } if"), vec![20.0]);
    assert_eq!(eval_floats("0 30 40 if"), vec![40.0]);
}
