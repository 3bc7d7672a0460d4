//! The ordering queue (`SPEC_FULL.md` §4.6): lets many worker threads finish
//! queries out of order while a single logical consumer still sees them in
//! strict submission order, without a dedicated writer thread — whichever
//! worker happens to hold the head slot runs the consumer callback inline.

use std::sync::{Condvar, Mutex};

enum Slot<T> {
    Reserved,
    Ready(T),
}

struct Inner<T> {
    slots:        Vec<Slot<T>>,
    next_id:      u64,
    head:         u64,
    limit:        usize,
    end_of_input: bool,
}

/// A bounded, order-restoring handoff queue. A producer calls
/// [`OrderingQueue::get`] to reserve the next slot in submission order (the
/// `init` closure runs under the queue lock and returns the slot's input, or
/// `None` to signal end-of-input), does its work, and calls
/// [`OrderingQueue::push`] with the result. The consumer closure supplied at
/// construction runs inline, in strictly ascending slot-id order, on
/// whichever thread's `push` call makes the head slot (and any consecutive
/// ready successors) ready.
pub struct OrderingQueue<In, Out, C> {
    inner:    Mutex<Inner<Out>>,
    not_full: Condvar,
    consume:  C,
    _input:   std::marker::PhantomData<In>,
}

impl<In, Out, C: Fn(Out)> OrderingQueue<In, Out, C> {
    /// `limit` bounds the number of reserved-but-unreleased slots; producers
    /// block in [`OrderingQueue::get`] once that many slots are outstanding.
    #[must_use]
    pub fn new(limit: usize, consume: C) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: Vec::new(),
                next_id: 0,
                head: 0,
                limit: limit.max(1),
                end_of_input: false,
            }),
            not_full: Condvar::new(),
            consume,
            _input: std::marker::PhantomData,
        }
    }

    /// Reserves the next slot and runs `init` under the queue lock to
    /// produce its input. Blocks while `reserved - ready >= limit`. Returns
    /// `(input, slot_id)`, or `None` once `init` returns `None` — the
    /// cooperative end-of-input signal; every subsequent call also returns
    /// `None` without reserving a slot.
    pub fn get(&self, init: impl FnOnce() -> Option<In>) -> Option<(In, u64)> {
        let mut guard = self.inner.lock().unwrap();
        loop {
            if guard.end_of_input {
                return None;
            }
            if guard.slots.len() < guard.limit {
                break;
            }
            guard = self.not_full.wait(guard).unwrap();
        }

        let Some(input) = init() else {
            guard.end_of_input = true;
            self.not_full.notify_all();
            return None;
        };

        let slot_id = guard.next_id;
        guard.next_id += 1;
        guard.slots.push(Slot::Reserved);
        Some((input, slot_id))
    }

    /// Marks `slot_id` ready with `output`. If `slot_id` is the current
    /// head, consumes it and any consecutive already-ready successors, in
    /// ascending order, by running the consumer closure inline on this
    /// thread; otherwise only marks the slot ready and returns.
    pub fn push(&self, slot_id: u64, output: Out) {
        let mut guard = self.inner.lock().unwrap();
        let idx = (slot_id - guard.head) as usize;
        guard.slots[idx] = Slot::Ready(output);

        if slot_id != guard.head {
            return;
        }

        let mut ready = Vec::new();
        while let Some(Slot::Ready(_)) = guard.slots.first() {
            let Slot::Ready(v) = guard.slots.remove(0) else { unreachable!() };
            ready.push(v);
            guard.head += 1;
        }
        self.not_full.notify_all();
        drop(guard);

        for v in ready {
            (self.consume)(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex as StdMutex,
    };

    #[test]
    fn push_out_of_order_still_consumes_in_order() {
        let consumed = Arc::new(StdMutex::new(Vec::new()));
        let consumed_clone = Arc::clone(&consumed);
        let queue: OrderingQueue<u32, u32, _> = OrderingQueue::new(8, move |v| consumed_clone.lock().unwrap().push(v));

        let (_, id0) = queue.get(|| Some(0)).unwrap();
        let (_, id1) = queue.get(|| Some(1)).unwrap();
        let (_, id2) = queue.get(|| Some(2)).unwrap();

        queue.push(id2, 20);
        assert!(consumed.lock().unwrap().is_empty());
        queue.push(id0, 0);
        assert_eq!(*consumed.lock().unwrap(), vec![0]);
        queue.push(id1, 10);
        assert_eq!(*consumed.lock().unwrap(), vec![0, 10, 20]);
    }

    #[test]
    fn get_returns_none_after_end_of_input() {
        let queue: OrderingQueue<u32, u32, _> = OrderingQueue::new(4, |_| {});
        assert!(queue.get(|| Some(1)).is_some());
        assert!(queue.get(|| None).is_none());
        assert!(queue.get(|| Some(1)).is_none());
    }

    #[test]
    fn concurrent_producers_preserve_submission_order() {
        let consumed = Arc::new(StdMutex::new(Vec::new()));
        let consumed_clone = Arc::clone(&consumed);
        let queue: OrderingQueue<u64, u64, _> = OrderingQueue::new(4, move |v| consumed_clone.lock().unwrap().push(v));
        let dispensed = AtomicUsize::new(0);

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let queue = &queue;
                let dispensed = &dispensed;
                scope.spawn(move || loop {
                    if dispensed.fetch_add(1, Ordering::SeqCst) >= 100 {
                        break;
                    }
                    let Some((input, id)) = queue.get(|| Some(())) else { break };
                    let _: () = input;
                    // The slot id itself is monotonic by construction, so
                    // pushing it back as the payload lets the test assert
                    // the consumer sees strictly ascending order.
                    queue.push(id, id);
                });
            }
        });

        let out = consumed.lock().unwrap();
        let mut sorted = out.clone();
        sorted.sort_unstable();
        assert_eq!(*out, sorted);
    }
}
