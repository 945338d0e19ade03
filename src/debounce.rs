use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};

/// Collapses bursts of input into the last value of each burst.
///
/// Values are handed to `on_settle` on a worker thread once no new value has
/// arrived for the quiet period. Dropping the debouncer flushes the pending
/// value and joins the worker. Only request volume is reduced; callers that
/// need ordering of the resulting work must sequence it themselves.
pub struct Debouncer<T: Send + 'static> {
    tx: Option<Sender<T>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new<F>(quiet: Duration, mut on_settle: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (tx, rx) = unbounded::<T>();
        let handle = thread::spawn(move || {
            while let Ok(mut latest) = rx.recv() {
                loop {
                    match rx.recv_timeout(quiet) {
                        Ok(next) => latest = next,
                        Err(RecvTimeoutError::Timeout) => {
                            on_settle(latest);
                            break;
                        }
                        Err(RecvTimeoutError::Disconnected) => {
                            on_settle(latest);
                            return;
                        }
                    }
                }
            }
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn push(&self, value: T) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(value);
        }
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
