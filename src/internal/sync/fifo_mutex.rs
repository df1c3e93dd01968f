//! An async mutex with strict FIFO handoff.
//!
//! Waiters queue in arrival order as oneshot channels. Unlocking passes the
//! baton directly to the first live waiter, skipping entries whose receiver
//! was dropped, so a cancelled `lock()` future can never stall the queue.
//! Wakeups are scheduler-mediated, which keeps handoff chains from growing
//! the stack no matter how many waiters drain in a row.

use std::{
    collections::VecDeque,
    sync::Mutex as StdMutex,
};

use tokio::sync::{Mutex as ValueMutex, MutexGuard as ValueGuard, oneshot};

struct LockState {
    locked: bool,
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// FIFO-fair async mutex.
pub struct FifoMutex<T> {
    state: StdMutex<LockState>,
    value: ValueMutex<T>,
}

impl<T> FifoMutex<T> {
    pub fn new(value: T) -> Self {
        FifoMutex {
            state: StdMutex::new(LockState {
                locked: false,
                waiters: VecDeque::new(),
            }),
            value: ValueMutex::new(value),
        }
    }

    /// Acquire without waiting; `None` if another holder exists.
    pub fn try_lock(&self) -> Option<FifoGuard<'_, T>> {
        let mut state = self.state.lock().expect("fifo mutex state poisoned");
        if state.locked {
            return None;
        }
        state.locked = true;
        drop(state);
        Some(self.guard())
    }

    /// Acquire, queueing in FIFO order behind current waiters.
    ///
    /// Dropping the returned future while it waits dequeues the waiter;
    /// if the baton arrives in the same instant it is passed on.
    pub async fn lock(&self) -> FifoGuard<'_, T> {
        loop {
            let rx = {
                let mut state = self.state.lock().expect("fifo mutex state poisoned");
                if !state.locked {
                    state.locked = true;
                    None
                } else {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    Some(rx)
                }
            };
            let Some(rx) = rx else {
                return self.guard();
            };

            let mut baton = Baton {
                mutex: self,
                rx: Some(rx),
                received: false,
            };
            if baton.rx.as_mut().expect("receiver present").await.is_ok() {
                baton.received = true;
                return self.guard();
            }
            // The sender vanished without a handoff; compete again.
        }
    }

    /// Waiters currently queued (diagnostics only).
    pub fn waiter_count(&self) -> usize {
        self.state
            .lock()
            .expect("fifo mutex state poisoned")
            .waiters
            .len()
    }

    fn guard(&self) -> FifoGuard<'_, T> {
        // The ticket just acquired guarantees exclusivity.
        let inner = self
            .value
            .try_lock()
            .expect("fifo ticket holder found value locked");
        FifoGuard {
            mutex: self,
            inner: Some(inner),
        }
    }

    fn unlock(&self) {
        let mut state = self.state.lock().expect("fifo mutex state poisoned");
        loop {
            match state.waiters.pop_front() {
                // Baton handed to the next live waiter; stays locked.
                Some(tx) => {
                    if tx.send(()).is_ok() {
                        return;
                    }
                }
                None => {
                    state.locked = false;
                    return;
                }
            }
        }
    }
}

/// A pending waiter. If the owning future is dropped after the baton was
/// already sent, `Drop` passes the lock straight on instead of losing it.
struct Baton<'a, T> {
    mutex: &'a FifoMutex<T>,
    rx: Option<oneshot::Receiver<()>>,
    received: bool,
}

impl<T> Drop for Baton<'_, T> {
    fn drop(&mut self) {
        if self.received {
            return;
        }
        if let Some(mut rx) = self.rx.take() {
            rx.close();
            if rx.try_recv().is_ok() {
                self.mutex.unlock();
            }
        }
    }
}

/// Lock token; dropping it hands the mutex to the next waiter.
pub struct FifoGuard<'a, T> {
    mutex: &'a FifoMutex<T>,
    inner: Option<ValueGuard<'a, T>>,
}

impl<T> std::ops::Deref for FifoGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.inner.as_ref().expect("guard value present")
    }
}

impl<T> std::ops::DerefMut for FifoGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.inner.as_mut().expect("guard value present")
    }
}

impl<T> Drop for FifoGuard<'_, T> {
    fn drop(&mut self) {
        // Release the value before the baton moves on.
        self.inner.take();
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::FutureExt;

    use super::FifoMutex;

    #[tokio::test]
    async fn test_uncontended_lock() {
        let mutex = FifoMutex::new(5u32);
        let mut guard = mutex.lock().await;
        *guard += 1;
        drop(guard);
        assert_eq!(*mutex.lock().await, 6);
    }

    #[tokio::test]
    async fn test_try_lock_while_held() {
        let mutex = FifoMutex::new(());
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    /// Waiters acquire in arrival order.
    #[tokio::test]
    async fn test_fifo_order() {
        let mutex = Arc::new(FifoMutex::new(()));
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let gate = mutex.lock().await;
        let mut handles = Vec::new();
        for i in 0..4u32 {
            let mutex_clone = Arc::clone(&mutex);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = mutex_clone.lock().await;
                order.lock().unwrap().push(i);
            }));
            // Let the spawned task enqueue before the next one starts.
            while mutex.waiter_count() < (i + 1) as usize {
                tokio::task::yield_now().await;
            }
        }
        drop(gate);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
    }

    /// A cancelled waiter is skipped at unlock time.
    #[tokio::test]
    async fn test_cancelled_waiter_is_skipped() {
        let mutex = FifoMutex::new(());
        let gate = mutex.lock().await;

        let mut cancelled = Box::pin(mutex.lock());
        assert!(cancelled.as_mut().now_or_never().is_none());
        assert_eq!(mutex.waiter_count(), 1);

        let mut second = Box::pin(mutex.lock());
        assert!(second.as_mut().now_or_never().is_none());
        assert_eq!(mutex.waiter_count(), 2);

        drop(cancelled);
        drop(gate);
        // The surviving waiter gets the baton despite queueing second.
        let guard = second.await;
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    /// Lock released by a finished task is observable by the next.
    #[tokio::test]
    async fn test_handoff_chain() {
        let mutex = Arc::new(FifoMutex::new(0u64));
        let mut handles = Vec::new();
        for _ in 0..64 {
            let mutex = Arc::clone(&mutex);
            handles.push(tokio::spawn(async move {
                let mut guard = mutex.lock().await;
                *guard += 1;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*mutex.lock().await, 64);
    }
}
