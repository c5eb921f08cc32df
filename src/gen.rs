//! The generator pull protocol.

use std::sync::Arc;

use crate::array::Array;
use crate::error::Result;
use crate::list::List;
use crate::vm::Thread;

/// What a generator did when pulled.
pub enum Pull {
    /// One block was produced. The engine attaches it to the current node
    /// and links a fresh thunk node that carries this generator onward.
    /// The array is shared, so a generator may hand out a block it does
    /// not own (cycling, appending).
    Fill(Arc<Array>),
    /// A final block was produced and the output continues with an
    /// already existing chain (take remainders, appends, last window).
    FillLink(Arc<Array>, Arc<List>),
    /// No block; the output continues directly with an existing chain.
    Link(Arc<List>),
    /// The stream is over. The current node becomes the shared terminal
    /// node and the generator (with all its inputs) is dropped.
    End,
}

impl Pull {
    /// Fill from a freshly produced block.
    pub fn fill(array: Array) -> Pull {
        Pull::Fill(Arc::new(array))
    }

    pub fn fill_link(array: Array, tail: Arc<List>) -> Pull {
        Pull::FillLink(Arc::new(array), tail)
    }
}

/// A producer of one list chain. Each `pull` yields at most one block.
///
/// A generator is owned by exactly one pending list node at a time; the
/// node's lock guarantees `pull` is never entered concurrently with
/// itself, and the materialised prefix is cached on the nodes, so any
/// number of consumers sees each element computed exactly once.
pub trait Gen: Send {
    /// Diagnostic name.
    fn type_name(&self) -> &'static str;

    /// Produce the next block.
    fn pull(&mut self, th: &mut Thread) -> Result<Pull>;
}

/// Block size for signal generators under the thread's current rate.
#[inline]
pub fn z_block_size(th: &Thread) -> usize {
    th.rate.block_size
}

/// Block size for stream generators.
#[inline]
pub fn v_block_size(th: &Thread) -> usize {
    th.vm.v_block_size
}
