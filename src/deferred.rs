//! One-shot slot for results that arrive after startup.
//!
//! The producer side ([`Resolver`]) may live on another thread (native font
//! loading) or in a local future (web fetches, web renderer setup). The
//! consumer polls once per frame and takes the value the first time it is
//! ready. Dropping the resolver without resolving keeps the slot pending.

use std::sync::Arc;
use std::task::Poll;

use parking_lot::Mutex;

enum Slot<T, E> {
    Pending,
    Settled(Result<T, E>),
    Taken,
}

/// Consumer half of a deferred value.
pub struct Deferred<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

/// Producer half of a deferred value.
pub struct Resolver<T, E> {
    slot: Arc<Mutex<Slot<T, E>>>,
}

impl<T, E> Deferred<T, E> {
    /// Creates an unresolved slot and the handle that settles it.
    pub fn channel() -> (Self, Resolver<T, E>) {
        let slot = Arc::new(Mutex::new(Slot::Pending));
        (
            Self {
                slot: Arc::clone(&slot),
            },
            Resolver { slot },
        )
    }

    pub fn ready(value: T) -> Self {
        Self::settled(Ok(value))
    }

    pub fn failed(error: E) -> Self {
        Self::settled(Err(error))
    }

    pub fn settled(result: Result<T, E>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::Settled(result))),
        }
    }

    /// A slot nobody will ever resolve.
    pub fn never() -> Self {
        let (deferred, _resolver) = Self::channel();
        deferred
    }

    /// Takes the result if it has arrived. After a result has been taken the
    /// slot reports `Pending` forever.
    pub fn poll(&self) -> Poll<Result<T, E>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Settled(result) => Poll::Ready(result),
            Slot::Pending => {
                *slot = Slot::Pending;
                Poll::Pending
            }
            Slot::Taken => Poll::Pending,
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Settled(_))
    }
}

impl<T, E> Resolver<T, E> {
    pub fn resolve(self, result: Result<T, E>) {
        *self.slot.lock() = Slot::Settled(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_delivers_once() {
        let (deferred, resolver) = Deferred::<u32, String>::channel();
        assert!(deferred.poll().is_pending());
        resolver.resolve(Ok(7));
        assert!(deferred.is_settled());
        assert_eq!(deferred.poll(), Poll::Ready(Ok(7)));
        assert!(deferred.poll().is_pending());
    }

    #[test]
    fn dropped_resolver_stays_pending() {
        let deferred = Deferred::<u32, String>::never();
        for _ in 0..3 {
            assert!(deferred.poll().is_pending());
        }
        assert!(!deferred.is_settled());
    }

    #[test]
    fn failures_are_reported() {
        let deferred = Deferred::<u32, String>::failed("gone".into());
        assert_eq!(deferred.poll(), Poll::Ready(Err("gone".to_string())));
    }

    #[test]
    fn resolves_across_threads() {
        let (deferred, resolver) = Deferred::<String, String>::channel();
        std::thread::spawn(move || resolver.resolve(Ok("done".into())))
            .join()
            .unwrap();
        assert_eq!(deferred.poll(), Poll::Ready(Ok("done".to_string())));
    }
}
