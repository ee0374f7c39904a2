//! Per-thread pooling of extraction buffers
//!
//! Every dispatch extracts `slot count + 1` values before invoking the
//! resolved operation. Allocating a fresh vector for each call is the main
//! per-call allocation on the dispatch path, so finished buffers are returned
//! to a small pool owned by the calling thread and handed out again to the
//! next dispatch on that thread.
//!
//! ## Reentrancy
//!
//! A buffer is taken out of the pool for the whole duration of a dispatch,
//! including the handler invocation. A nested dispatch issued by the handler
//! therefore never observes the values its caller is still consuming: it draws
//! another spare buffer, or allocates one if the pool is empty.
//!
//! ## Thread Safety
//!
//! Buffers hold borrowed values and never leave the thread that filled them.
//! The pool lives in a `thread_local!`, so no locking is involved.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;

/// Maximum number of spare buffers kept per thread (soft limit)
const MAX_SPARE_BUFFERS: usize = 16;

thread_local! {
    static SPARE_BUFFERS: RefCell<Vec<Vec<Arg<'static>>>> = const { RefCell::new(Vec::new()) };
}

/// One extracted dispatch argument
pub enum Arg<'a> {
    /// Borrowed from the subject: the subject itself or a stored slot
    Borrowed(&'a dyn Any),
    /// Produced by a computed slot
    Owned(Box<dyn Any>),
}

impl<'a> Arg<'a> {
    pub fn as_any(&self) -> &dyn Any {
        match self {
            Arg::Borrowed(value) => *value,
            Arg::Owned(value) => &**value,
        }
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, Arg::Owned(_))
    }
}

impl fmt::Debug for Arg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Borrowed(_) => f.write_str("Arg::Borrowed(..)"),
            Arg::Owned(_) => f.write_str("Arg::Owned(..)"),
        }
    }
}

/// Scratch vector holding the values of one dispatch.
///
/// A pooled buffer returns its allocation to the current thread's pool when
/// dropped (RAII pattern).
pub struct ExtractionBuffer<'a> {
    values: Vec<Arg<'a>>,
    pooled: bool,
}

impl<'a> ExtractionBuffer<'a> {
    /// Takes a spare buffer from this thread's pool, or allocates one.
    ///
    /// The buffer has room for at least `len` values. Spare buffers are shared
    /// by every data type dispatched on the thread, so a recycled one may be
    /// larger; only the number of values pushed is exact.
    pub fn acquire(len: usize) -> Self {
        let spare = SPARE_BUFFERS
            .try_with(|pool| pool.try_borrow_mut().ok().and_then(|mut pool| pool.pop()))
            .ok()
            .flatten();

        let mut values = spare.map(recycle).unwrap_or_default();
        values.reserve_exact(len);

        Self { values, pooled: true }
    }

    /// Allocates a buffer that is dropped instead of being pooled
    pub fn unpooled(len: usize) -> Self {
        Self {
            values: Vec::with_capacity(len),
            pooled: false,
        }
    }

    pub fn values(&self) -> &[Arg<'a>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn push(&mut self, value: Arg<'a>) {
        self.values.push(value);
    }

    pub(crate) fn into_values(mut self) -> Vec<Arg<'a>> {
        self.pooled = false;
        std::mem::take(&mut self.values)
    }
}

impl Drop for ExtractionBuffer<'_> {
    fn drop(&mut self) {
        if !self.pooled || self.values.capacity() == 0 {
            return;
        }

        let values = recycle(std::mem::take(&mut self.values));

        // The pool may already be torn down when a thread exits
        let _ = SPARE_BUFFERS.try_with(|pool| {
            if let Ok(mut pool) = pool.try_borrow_mut() {
                if pool.len() < MAX_SPARE_BUFFERS {
                    pool.push(values);
                }
            }
        });
    }
}

/// Empties `values` and rebinds its lifetime, keeping the allocation.
///
/// `Arg<'a>` and `Arg<'b>` have the same layout, so the in-place collect
/// reuses the original allocation.
fn recycle<'a, 'b>(mut values: Vec<Arg<'a>>) -> Vec<Arg<'b>> {
    values.clear();
    values.into_iter().filter_map(|_| None).collect()
}

/// Number of spare buffers pooled on the current thread
pub fn spare_buffers() -> usize {
    SPARE_BUFFERS
        .try_with(|pool| pool.try_borrow().map(|pool| pool.len()).unwrap_or(0))
        .unwrap_or(0)
}
