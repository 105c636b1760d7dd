//! Run-once gate that remembers its outcome.

use std::sync::OnceLock;

use crate::error::WgPrngError;

/// What a gated computation produced: its value, and the error that cut it
/// short, if any. A value is kept even when an error is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T> {
    /// The (possibly partial) value.
    pub value: T,
    /// The error that stopped the computation.
    pub error: Option<WgPrngError>,
}

impl<T> Outcome<T> {
    /// Returns the recorded error, if any.
    pub fn result(&self) -> Result<(), WgPrngError> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Executes a computation at most once and stores its [`Outcome`].
///
/// Concurrent callers block until the first execution finishes and then all
/// observe the same outcome. Later calls never run their closure.
#[derive(Debug)]
pub struct OnceWithError<T> {
    cell: OnceLock<Outcome<T>>,
}

impl<T> Default for OnceWithError<T> {
    fn default() -> Self {
        OnceWithError {
            cell: OnceLock::new(),
        }
    }
}

impl<T> OnceWithError<T> {
    /// Creates a gate that has not run yet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` if nothing has run yet, and returns the stored outcome.
    pub fn call_once<F>(&self, f: F) -> &Outcome<T>
    where
        F: FnOnce() -> Outcome<T>,
    {
        self.cell.get_or_init(f)
    }

    /// The stored outcome, or `None` if the gate has not run.
    pub fn get(&self) -> Option<&Outcome<T>> {
        self.cell.get()
    }

    /// Whether the gate has already run.
    pub fn is_done(&self) -> bool {
        self.cell.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_runs_once() {
        let gate = OnceWithError::new();
        assert!(!gate.is_done());

        let first = gate.call_once(|| Outcome {
            value: 1,
            error: None,
        });
        assert_eq!(first.value, 1);

        let second = gate.call_once(|| Outcome {
            value: 2,
            error: Some(WgPrngError::validation("never stored")),
        });
        assert_eq!(second.value, 1);
        assert_eq!(second.result(), Ok(()));
        assert!(gate.is_done());
    }

    #[test]
    fn test_remembers_error() {
        let gate: OnceWithError<Vec<u8>> = OnceWithError::new();
        gate.call_once(|| Outcome {
            value: vec![1, 2],
            error: Some(WgPrngError::range(3, 2)),
        });

        let outcome = gate.call_once(|| panic!("must not run again"));
        assert_eq!(outcome.value, vec![1, 2]);
        assert_eq!(outcome.result(), Err(WgPrngError::range(3, 2)));
    }

    #[test]
    fn test_concurrent_callers() {
        let gate = Arc::new(OnceWithError::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let gate = Arc::clone(&gate);
                let runs = Arc::clone(&runs);
                thread::spawn(move || {
                    gate.call_once(|| {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Outcome {
                            value: i,
                            error: None,
                        }
                    })
                    .value
                })
            })
            .collect();

        let values: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(values.windows(2).all(|w| w[0] == w[1]));
    }
}
