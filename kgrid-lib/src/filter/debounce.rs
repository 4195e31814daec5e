//! Quiet-period debouncing of user input

use std::time::Duration;

use tokio::sync::watch;
use tokio::time;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Input<T> {
    value: T,
    changed_at: Option<Instant>,
}

/// Holds the latest input and lets callers wait until it stops changing.
///
/// Writers call [`update`](Self::update) as often as they like;
/// [`settle`](Self::settle) resolves once no update has happened for the
/// configured delay and yields the value at that moment.
///
/// ```
/// # async fn demo() {
/// use std::time::Duration;
/// use kgrid_lib::filter::Debouncer;
///
/// let input = Debouncer::new(String::new(), Duration::from_millis(250));
/// input.update(|q| q.push_str("acme"));
/// assert_eq!(input.settle().await, "acme");
/// # }
/// ```
#[derive(Debug)]
pub struct Debouncer<T> {
    tx: watch::Sender<Input<T>>,
    delay: Duration,
}

impl<T: Clone> Debouncer<T> {
    /// Creates a debouncer holding `initial`, already settled.
    pub fn new(initial: T, delay: Duration) -> Self {
        let (tx, _) = watch::channel(Input {
            value: initial,
            changed_at: None,
        });
        Self { tx, delay }
    }

    /// Returns the quiet period.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Modifies the input and restarts the quiet period.
    pub fn update(&self, modify: impl FnOnce(&mut T)) {
        self.tx.send_modify(|input| {
            modify(&mut input.value);
            input.changed_at = Some(Instant::now());
        });
    }

    /// Returns the latest input without waiting.
    pub fn latest(&self) -> T {
        self.tx.borrow().value.clone()
    }

    /// Returns `true` if the last update happened less than one delay ago.
    pub fn is_pending(&self) -> bool {
        self.tx
            .borrow()
            .changed_at
            .is_some_and(|at| at.elapsed() < self.delay)
    }

    /// Waits until the input has been quiet for the delay, then returns it.
    pub async fn settle(&self) -> T {
        let mut rx = self.tx.subscribe();
        loop {
            let Some(changed_at) = rx.borrow_and_update().changed_at else {
                break;
            };
            match time::timeout_at(changed_at + self.delay, rx.changed()).await {
                Ok(Ok(())) => continue,
                _ => break,
            }
        }
        rx.borrow().value.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const DELAY: Duration = Duration::from_millis(250);

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_for_the_delay() {
        let input = Debouncer::new(0u32, DELAY);
        input.update(|v| *v = 1);
        assert!(input.is_pending());

        let start = Instant::now();
        assert_eq!(input.settle().await, 1);
        assert!(start.elapsed() >= DELAY);
        assert!(!input.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_during_wait_restarts_the_quiet_period() {
        let input = Arc::new(Debouncer::new(0u32, DELAY));
        input.update(|v| *v = 1);

        let writer = input.clone();
        tokio::spawn(async move {
            time::sleep(Duration::from_millis(100)).await;
            writer.update(|v| *v = 2);
        });

        let start = Instant::now();
        assert_eq!(input.settle().await, 2);
        assert!(start.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_untouched_input_settles_immediately() {
        let input = Debouncer::new("a", DELAY);

        let start = Instant::now();
        assert_eq!(input.settle().await, "a");
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
