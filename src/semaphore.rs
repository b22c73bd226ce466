//! Abstract bounded-concurrency token (§4.1).
//!
//! Two constructors, `none()` and `bounded(n)`, behind one interface so
//! call sites never branch on which mode is active — the same shape cargo
//! itself avoids by handing every spawned rustc job a `jobserver` token
//! acquired up front, whether or not `-j` was actually bounded.

use std::sync::Arc;

#[derive(Clone)]
pub enum Semaphore {
    /// `withToken` is the identity: no acquisition, no limit.
    None,
    /// FIFO-ish token pool backed by an in-process jobserver. `n` is kept
    /// only for diagnostics; the bound itself lives in the client's token
    /// count.
    Bounded { n: usize, client: Arc<jobserver::Client> },
}

pub struct Token {
    // `None` for `Semaphore::None`; held for the lifetime of the guarded
    // action under `Bounded`, released on drop.
    _acquired: Option<jobserver::Acquired>,
}

impl Semaphore {
    pub fn none() -> Semaphore {
        Semaphore::None
    }

    /// `n = 0` is an input alias for `none()`, per §4.1.
    pub fn bounded(n: usize) -> Semaphore {
        if n == 0 {
            return Semaphore::None;
        }
        // `Client::new` creates a private, in-process jobserver with `n`
        // tokens; it is not inherited by children unless explicitly
        // configured onto a `Command`, so it only governs this process's
        // own concurrency, matching the spec's "no global mutation".
        match jobserver::Client::new(n) {
            Ok(client) => Semaphore::Bounded {
                n,
                client: Arc::new(client),
            },
            // A jobserver client is just a pipe pair; if creation fails
            // (exhausted file descriptors, sandboxed environment) falling
            // back to unbounded is safer than aborting the whole run over
            // a concurrency *limit* we can't construct.
            Err(_) => Semaphore::None,
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Semaphore::None => None,
            Semaphore::Bounded { n, .. } => Some(*n),
        }
    }

    /// Acquire a token, run `action`, release on return (including on
    /// panic, via `Token`'s `Drop`). Blocks the calling thread if the pool
    /// is exhausted.
    pub fn with_token<T>(&self, action: impl FnOnce() -> T) -> T {
        let _token = self.acquire();
        action()
    }

    pub fn acquire(&self) -> Token {
        match self {
            Semaphore::None => Token { _acquired: None },
            Semaphore::Bounded { client, .. } => {
                let acquired = client
                    .acquire()
                    .expect("jobserver client pipe closed unexpectedly");
                Token {
                    _acquired: Some(acquired),
                }
            }
        }
    }
}
