//! Pull protocol properties: block accounting, memoisation, end linking.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use sapf::array::{Array, ItemKind};
use sapf::gen::{Gen, Pull};
use sapf::input::{BothIn, ZIn};
use sapf::list::List;
use sapf::value::V;
use sapf::vm::Thread;
use sapf::Result;

/// A finite ramp with instrumented pulls.
struct CountedRamp {
    remaining: usize,
    next: f64,
    block: usize,
    fills: Arc<AtomicUsize>,
    ends: Arc<AtomicUsize>,
}

impl Gen for CountedRamp {
    fn type_name(&self) -> &'static str {
        "CountedRamp"
    }

    fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
        if self.remaining == 0 {
            self.ends.fetch_add(1, Ordering::SeqCst);
            return Ok(Pull::End);
        }
        self.fills.fetch_add(1, Ordering::SeqCst);
        let n = self.remaining.min(self.block);
        let mut out = Array::with_capacity(ItemKind::Z, n);
        for _ in 0..n {
            out.pushz(self.next);
            self.next += 1.0;
        }
        self.remaining -= n;
        Ok(Pull::fill(out))
    }
}

fn counted(len: usize, block: usize) -> (Arc<List>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let fills = Arc::new(AtomicUsize::new(0));
    let ends = Arc::new(AtomicUsize::new(0));
    let gen = CountedRamp {
        remaining: len,
        next: 0.0,
        block,
        fills: fills.clone(),
        ends: ends.clone(),
    };
    (List::from_gen(ItemKind::Z, true, Box::new(gen)), fills, ends)
}

fn drain(th: &mut Thread, list: Arc<List>) -> Vec<f64> {
    let mut zin = ZIn::new(V::List(list));
    let mut out = Vec::new();
    while let Some(z) = zin.onez(th).unwrap() {
        out.push(z);
    }
    out
}

#[test]
fn fill_count_is_length_over_block() {
    for (len, block) in [(10usize, 512usize), (512, 512), (513, 512), (1300, 512), (7, 3)] {
        let mut th = Thread::for_tests();
        let (list, fills, ends) = counted(len, block);
        let items = drain(&mut th, list);
        assert_eq!(items.len(), len);
        let expected = len.div_ceil(block);
        assert_eq!(fills.load(Ordering::SeqCst), expected, "len {len} block {block}");
        assert_eq!(ends.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn last_block_is_short_by_the_remainder() {
    let mut th = Thread::for_tests();
    let (list, _, _) = counted(1300, 512);
    // walk the chain node by node
    let mut sizes = Vec::new();
    let mut cur = list;
    loop {
        let (array, next) = cur.forced(&mut th).unwrap();
        if array.len() > 0 {
            sizes.push(array.len());
        }
        match next {
            Some(tail) => cur = tail,
            None => break,
        }
    }
    assert_eq!(sizes, vec![512, 512, 276]);
}

#[test]
fn two_consumers_share_one_run() {
    let mut th = Thread::for_tests();
    let (list, fills, _) = counted(100, 16);
    let a = drain(&mut th, list.clone());
    let pulls_after_first = fills.load(Ordering::SeqCst);
    let b = drain(&mut th, list);
    assert_eq!(a, b);
    // the second traversal reads cached nodes only
    assert_eq!(fills.load(Ordering::SeqCst), pulls_after_first);
}

#[test]
fn interleaved_consumers_see_the_same_sequence() {
    let mut th = Thread::for_tests();
    let (list, _, _) = counted(50, 8);
    let mut a = ZIn::new(V::List(list.clone()));
    let mut b = ZIn::new(V::List(list));
    for _ in 0..50 {
        let x = a.onez(&mut th).unwrap();
        let y = b.onez(&mut th).unwrap();
        assert_eq!(x, y);
    }
    assert!(a.onez(&mut th).unwrap().is_none());
    assert!(b.onez(&mut th).unwrap().is_none());
}

#[test]
fn pack_concatenates_the_chain() {
    let mut th = Thread::for_tests();
    let (list, _, _) = counted(1000, 64);
    let packed = list.pack(&mut th).unwrap();
    assert!(packed.is_packed());
    let array = packed.array().unwrap();
    assert_eq!(array.len(), 1000);
    assert_eq!(array.atz(999), 999.0);
}

#[test]
fn pack_of_indefinite_fails() {
    let list = List::from_gen(
        ItemKind::Z,
        false,
        Box::new(CountedRamp {
            remaining: usize::MAX,
            next: 0.0,
            block: 8,
            fills: Arc::new(AtomicUsize::new(0)),
            ends: Arc::new(AtomicUsize::new(0)),
        }),
    );
    let mut th = Thread::for_tests();
    match list.pack(&mut th) {
        Err(sapf::Error::Indefinite(_)) => {}
        other => panic!("expected indefinite, got {other:?}"),
    }
}

#[test]
fn length_forces_and_counts() {
    let mut th = Thread::for_tests();
    let (list, _, _) = counted(123, 16);
    assert_eq!(list.length(&mut th).unwrap(), 123);
}

#[test]
fn errors_leave_the_node_retryable() {
    struct FailsOnce {
        failed: bool,
    }
    impl Gen for FailsOnce {
        fn type_name(&self) -> &'static str {
            "FailsOnce"
        }
        fn pull(&mut self, _th: &mut Thread) -> Result<Pull> {
            if !self.failed {
                self.failed = true;
                return Err(sapf::Error::Failed("first pull".to_string()));
            }
            let mut out = Array::with_capacity(ItemKind::Z, 1);
            out.pushz(42.0);
            Ok(Pull::fill(out))
        }
    }
    let mut th = Thread::for_tests();
    let list = List::from_gen(ItemKind::Z, false, Box::new(FailsOnce { failed: false }));
    assert!(list.force(&mut th).is_err());
    // the generator stays attached; the next consumer retries it
    let (array, _) = list.forced(&mut th).unwrap();
    assert_eq!(array.atz(0), 42.0);
}

#[test]
fn both_cursor_reads_either_kind() {
    let mut th = Thread::for_tests();
    let (list, _, _) = counted(3, 2);
    let mut input = BothIn::new(V::List(list));
    assert_eq!(input.one(&mut th).unwrap().unwrap().to_float_lossy(), 0.0);
    assert_eq!(input.onez(&mut th).unwrap(), Some(1.0));
    assert_eq!(input.onei(&mut th).unwrap(), Some(2));
    assert!(input.one(&mut th).unwrap().is_none());
}
