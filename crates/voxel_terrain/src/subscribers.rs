//! Fan-out of completion messages to whoever asked for them.
//!
//! ```text
//!   worker ──publish(msg)──► Subscribers ──clone──► Receiver (subscriber A)
//!                                       └──clone──► Receiver (subscriber B)
//! ```
//!
//! The hub keeps only senders. Messages published while nobody is
//! subscribed are dropped on the spot, and a subscriber that drops its
//! receiver is pruned on the next publish, so undelivered messages never
//! outlive their audience.

use std::sync::{Mutex, PoisonError};

use crossbeam_channel::{self as channel, Receiver, Sender};

pub struct Subscribers<T> {
  senders: Mutex<Vec<Sender<T>>>,
}

impl<T: Clone> Subscribers<T> {
  pub fn new() -> Self {
    Self {
      senders: Mutex::new(Vec::new()),
    }
  }

  /// New receiver that sees every message published from now on.
  pub fn subscribe(&self) -> Receiver<T> {
    let (sender, receiver) = channel::unbounded();
    self.senders.lock().unwrap_or_else(PoisonError::into_inner).push(sender);
    receiver
  }

  /// Deliver `message` to every live subscriber. Returns how many got it.
  pub fn publish(&self, message: T) -> usize {
    let mut senders = self.senders.lock().unwrap_or_else(PoisonError::into_inner);
    senders.retain(|sender| sender.send(message.clone()).is_ok());
    senders.len()
  }

  /// Live subscribers as of the last publish.
  pub fn len(&self) -> usize {
    self.senders.lock().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<T: Clone> Default for Subscribers<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> std::fmt::Debug for Subscribers<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let count = self.senders.lock().unwrap_or_else(PoisonError::into_inner).len();
    f.debug_struct("Subscribers").field("count", &count).finish()
  }
}
