//! Turn state, stream parsing, and the chat controller.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod config;
pub mod controller;
pub mod message_buffer;
pub mod progress;
pub mod stream;
pub mod transcript;
pub mod turn;

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
