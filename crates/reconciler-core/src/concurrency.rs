//! Bounded-parallelism primitive shared by the HTTP transport and, optionally,
//! the scheduler (`spec.md` §4.J).

use std::sync::{Arc, Condvar, Mutex};

/// A counting semaphore. `max_concurrent <= 0` means unbounded: every `acquire`
/// returns immediately and [`Permit`] drop is a no-op.
#[derive(Clone)]
pub struct Limiter {
    inner: Option<Arc<(Mutex<u32>, Condvar)>>,
    max: u32,
}

impl Limiter {
    pub fn new(max_concurrent: i64) -> Self {
        if max_concurrent <= 0 {
            Self { inner: None, max: 0 }
        } else {
            Self {
                inner: Some(Arc::new((Mutex::new(max_concurrent as u32), Condvar::new()))),
                max: max_concurrent as u32,
            }
        }
    }

    pub fn unbounded() -> Self {
        Self { inner: None, max: 0 }
    }

    pub fn max_concurrent(&self) -> Option<u32> {
        self.inner.as_ref().map(|_| self.max)
    }

    /// Block until a slot is available, returning a [`Permit`] that releases it
    /// on drop.
    pub fn acquire(&self) -> Permit {
        if let Some(pair) = &self.inner {
            let (lock, cvar) = &**pair;
            let mut available = lock.lock().expect("limiter mutex poisoned");
            while *available == 0 {
                available = cvar.wait(available).expect("limiter mutex poisoned");
            }
            *available -= 1;
        }
        Permit {
            inner: self.inner.clone(),
        }
    }

    /// Attempt to acquire without blocking.
    pub fn try_acquire(&self) -> Option<Permit> {
        match &self.inner {
            None => Some(Permit { inner: None }),
            Some(pair) => {
                let (lock, _) = &**pair;
                let mut available = lock.lock().expect("limiter mutex poisoned");
                if *available == 0 {
                    None
                } else {
                    *available -= 1;
                    Some(Permit {
                        inner: self.inner.clone(),
                    })
                }
            }
        }
    }
}

pub struct Permit {
    inner: Option<Arc<(Mutex<u32>, Condvar)>>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        if let Some(pair) = &self.inner {
            let (lock, cvar) = &**pair;
            let mut available = lock.lock().expect("limiter mutex poisoned");
            *available += 1;
            cvar.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn unbounded_limiter_never_blocks() {
        let limiter = Limiter::new(0);
        let _a = limiter.acquire();
        let _b = limiter.acquire();
        assert!(limiter.max_concurrent().is_none());
    }

    #[test]
    fn bounded_limiter_caps_in_flight_count() {
        let limiter = Limiter::new(2);
        let in_flight = Arc::new(AtomicU32::new(0));
        let max_seen = Arc::new(AtomicU32::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                thread::spawn(move || {
                    let _permit = limiter.acquire();
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(std::time::Duration::from_millis(5));
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert!(max_seen.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn try_acquire_returns_none_when_exhausted() {
        let limiter = Limiter::new(1);
        let _permit = limiter.acquire();
        assert!(limiter.try_acquire().is_none());
    }
}
