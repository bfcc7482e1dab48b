/*
 * SPDX-FileCopyrightText: 2024 Tommaso Fontana
 * SPDX-FileCopyrightText: 2024 Sebastiano Vigna
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Synchronization primitives for the loader pipeline.
//!
//! Bounded MPMC queues are [`crossbeam_channel::bounded`] channels;
//! completion is signalled by dropping every sender, which turns blocked
//! receives into [`RecvError`](crossbeam_channel::RecvError)s once the
//! buffer drains. This module adds the two pieces crossbeam does not
//! provide: in-order delivery of tagged portions and a counting semaphore
//! with a wait-for-zero operation.

use crossbeam_channel::Receiver;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::{Condvar, Mutex};

/// Restores the order of portions produced concurrently by several
/// workers.
///
/// Wraps a receiver of `(portion, item)` pairs, where portion ids are a
/// permutation of `0..n`, and delivers items in ascending portion order
/// regardless of arrival order. Out-of-order arrivals are parked in a
/// binary heap; the number of parked items is bounded by the number of
/// in-flight portions, which the caller bounds through its item pool.
pub struct OrderedReceiver<T> {
    rx: Receiver<(usize, T)>,
    parked: BinaryHeap<Reverse<Portion<T>>>,
    next: usize,
}

struct Portion<T> {
    id: usize,
    item: T,
}

impl<T> PartialEq for Portion<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Portion<T> {}

impl<T> PartialOrd for Portion<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Portion<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> OrderedReceiver<T> {
    pub fn new(rx: Receiver<(usize, T)>) -> Self {
        OrderedReceiver {
            rx,
            parked: BinaryHeap::new(),
            next: 0,
        }
    }

    /// Receives the next portion in id order.
    ///
    /// Returns `None` once all senders are gone and no parked portion is
    /// left.
    pub fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(Reverse(head)) = self.parked.peek() {
                if head.id == self.next {
                    let Reverse(head) = self.parked.pop().unwrap();
                    self.next += 1;
                    return Some(head.item);
                }
            }
            match self.rx.recv() {
                Ok((id, item)) => {
                    debug_assert!(id >= self.next);
                    self.parked.push(Reverse(Portion { id, item }));
                }
                Err(_) => {
                    // all senders gone; whatever is parked cannot be
                    // completed by a missing predecessor anymore
                    debug_assert!(
                        self.parked.peek().map(|Reverse(p)| p.id) == Some(self.next)
                            || self.parked.is_empty()
                    );
                    let Reverse(head) = self.parked.pop()?;
                    self.next = head.id + 1;
                    return Some(head.item);
                }
            }
        }
    }
}

/// A counting semaphore with a wait-for-zero operation.
///
/// The mapper increments the counter by the number of updaters before
/// broadcasting a portion and blocks on [`wait_zero`](Semaphore::wait_zero)
/// before extending shared state; each updater decrements after consuming
/// its share of the portion.
pub struct Semaphore {
    counter: Mutex<isize>,
    cv: Condvar,
}

impl Semaphore {
    pub fn new() -> Self {
        Semaphore {
            counter: Mutex::new(0),
            cv: Condvar::new(),
        }
    }

    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, n: usize) {
        let mut counter = self.counter.lock().unwrap();
        *counter += n as isize;
    }

    pub fn dec(&self) {
        let mut counter = self.counter.lock().unwrap();
        *counter -= 1;
        if *counter == 0 {
            self.cv.notify_all();
        }
    }

    /// Blocks until the counter reaches zero.
    pub fn wait_zero(&self) {
        let counter = self.counter.lock().unwrap();
        let _guard = self.cv.wait_while(counter, |c| *c != 0).unwrap();
    }
}

impl Default for Semaphore {
    fn default() -> Self {
        Self::new()
    }
}
