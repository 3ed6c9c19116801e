#![forbid(unsafe_code)]

//! Cooperative "next idle turn" task queue.
//!
//! The host event loop owns the cadence: it calls [`IdleQueue::run_idle`]
//! once it has finished dispatching the current input event (or frame).
//! Anything posted during that dispatch runs then; anything posted while
//! `run_idle` itself is draining waits for the following turn.
//!
//! # Invariants
//!
//! 1. Tasks run in FIFO order.
//! 2. A task never runs inside the `post()` call that queued it.
//! 3. `run_idle()` runs exactly the tasks queued before it was called.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Shared single-threaded idle task queue. Clones share the same queue.
#[derive(Clone, Default)]
pub struct IdleQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl IdleQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next idle turn.
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn run_idle(&self) -> usize {
        let batch: Vec<Task> = self.tasks.borrow_mut().drain(..).collect();
        let count = batch.len();
        for task in batch {
            task();
        }
        if count > 0 {
            tracing::trace!(count, "idle turn drained");
        }
        count
    }

    /// Number of pending tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl fmt::Debug for IdleQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleQueue")
            .field("pending", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn post_defers_until_idle() {
        let queue = IdleQueue::new();
        let ran = Rc::new(Cell::new(false));
        let r = Rc::clone(&ran);
        queue.post(move || r.set(true));

        assert!(!ran.get());
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.run_idle(), 1);
        assert!(ran.get());
        assert!(queue.is_empty());
    }

    #[test]
    fn fifo_order() {
        let queue = IdleQueue::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let o = Rc::clone(&order);
            queue.post(move || o.borrow_mut().push(i));
        }
        queue.run_idle();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_posted_while_draining_wait_a_turn() {
        let queue = IdleQueue::new();
        let hits = Rc::new(Cell::new(0));

        let q = queue.clone();
        let h = Rc::clone(&hits);
        queue.post(move || {
            let h = Rc::clone(&h);
            q.post(move || h.set(h.get() + 1));
        });

        assert_eq!(queue.run_idle(), 1);
        assert_eq!(hits.get(), 0);
        assert_eq!(queue.run_idle(), 1);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn empty_turn_is_cheap() {
        let queue = IdleQueue::new();
        assert_eq!(queue.run_idle(), 0);
        assert!(format!("{queue:?}").contains("pending: 0"));
    }
}
