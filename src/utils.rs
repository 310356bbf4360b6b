use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Longest uninterrupted slice of a cancellable sleep.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Shared flag for stopping a running settle loop from another thread.
///
/// Clones observe the same flag, so one copy can live in a Ctrl+C handler
/// while the stage holds another.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for the next move.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Sleep for `duration` unless the token fires first.
///
/// Returns `false` when cancelled, either before or during the sleep.
pub fn sleep_unless_cancelled(duration: Duration, cancel: Option<&CancelToken>) -> bool {
    let Some(token) = cancel else {
        std::thread::sleep(duration);
        return true;
    };

    let deadline = Instant::now() + duration;
    loop {
        if token.is_cancelled() {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        std::thread::sleep((deadline - now).min(CANCEL_CHECK_INTERVAL));
    }
}

/// Error type for polling operations
#[derive(Debug)]
pub enum PollError<E> {
    /// The cancel token fired before the condition was met
    Cancelled,
    /// Error occurred in the condition/operation function
    ConditionError(E),
}

impl<E> std::fmt::Display for PollError<E>
where
    E: std::fmt::Display,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollError::Cancelled => write!(f, "Operation cancelled"),
            PollError::ConditionError(e) => write!(f, "Condition error: {}", e),
        }
    }
}

impl<E> std::error::Error for PollError<E>
where
    E: std::error::Error + 'static,
{
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollError::Cancelled => None,
            PollError::ConditionError(e) => Some(e),
        }
    }
}

/// Result of [`poll_attempts`].
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome<T> {
    /// Last value produced, whether or not it satisfied the condition
    pub value: T,
    /// Number of times `next` ran
    pub attempts: u32,
    /// Whether `value` satisfies the condition
    pub done: bool,
}

/// Poll a value until it satisfies a condition, with an attempt budget
///
/// Starting from `initial`, waits `interval` and calls `next` for a fresh
/// value until `is_done` accepts one or `max_attempts` calls have been made.
/// Running out of attempts is not an error: the last value comes back with
/// `done == false`.
///
/// # Returns
/// * `Ok(outcome)` when the condition is met or attempts run out
/// * `Err(PollError::Cancelled)` when the token fires before a retry
/// * `Err(PollError::ConditionError(e))` as soon as `next` fails
///
/// # Example
/// ```
/// use std::time::Duration;
/// use nanodrive::utils::poll_attempts;
///
/// let mut readings = vec![3.0, 2.0, 1.0].into_iter();
/// let outcome = poll_attempts(
///     10.0,
///     |v: &f64| *v <= 1.5,
///     || Ok::<f64, ()>(readings.next().unwrap_or(0.0)),
///     10,
///     Duration::from_millis(1),
///     None,
/// )
/// .unwrap();
///
/// assert!(outcome.done);
/// assert_eq!(outcome.value, 1.0);
/// assert_eq!(outcome.attempts, 3);
/// ```
pub fn poll_attempts<T, E, C, F>(
    initial: T,
    mut is_done: C,
    mut next: F,
    max_attempts: u32,
    interval: Duration,
    cancel: Option<&CancelToken>,
) -> Result<PollOutcome<T>, PollError<E>>
where
    C: FnMut(&T) -> bool,
    F: FnMut() -> Result<T, E>,
{
    let mut value = initial;
    let mut attempts = 0;

    while !is_done(&value) {
        if attempts >= max_attempts {
            return Ok(PollOutcome {
                value,
                attempts,
                done: false,
            });
        }
        if !sleep_unless_cancelled(interval, cancel) {
            return Err(PollError::Cancelled);
        }
        value = next().map_err(PollError::ConditionError)?;
        attempts += 1;
    }

    Ok(PollOutcome {
        value,
        attempts,
        done: true,
    })
}
