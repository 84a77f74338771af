use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::SieveError;

pub(crate) mod chrome;
#[cfg(test)]
pub(crate) mod fake;


/// A snapshot of one element matched by a selector.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ElementInfo {
    pub(crate) id: Option<String>,
    pub(crate) text: String,
}


/// What the job boards need from a browser tab.
///
/// Implemented by [`chrome::ChromeTab`] for real runs, and by a scripted fake in tests
/// so that the walker and the watchers never need a live browser.
pub(crate) trait PageDriver: Send + Sync {
    /// Loads the given url and returns once the load has finished.
    fn navigate(&self, url: &str) -> anyhow::Result<()>;

    fn url(&self) -> String;

    /// Waits up to `timeout` for an element matching `selector` to exist.
    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()>;

    /// Every element currently matching `selector`, in document order.
    fn query_elements(&self, selector: &str) -> anyhow::Result<Vec<ElementInfo>>;

    /// Clicks the first element matching `selector`.
    fn click(&self, selector: &str) -> anyhow::Result<()>;

    /// Evaluates a javascript expression in the page and returns its JSON value.
    fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value>;

    /// Waits up to `timeout` for the tab to leave `from_url`.
    ///
    /// Returns true once a navigation away from `from_url` has finished loading.
    fn wait_for_navigation(&self, from_url: &str, timeout: Duration) -> anyhow::Result<bool>;

    /// The full HTML of the current document.
    fn content(&self) -> anyhow::Result<String>;

    /// A PNG capture of the visible viewport.
    fn screenshot(&self) -> anyhow::Result<Vec<u8>>;
}


#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryOptions {
    /// How many times the action may be invoked.
    pub(crate) tries: u32,
    /// How long to wait for the condition after each invocation.
    pub(crate) interval: Duration,
}


impl Default for RetryOptions {
    fn default() -> Self {
        Self { tries: 10, interval: Duration::from_millis(1000) }
    }
}


/// Invokes `action` right away and then once per interval until `settled` reports success.
///
/// `settled` is handed the interval and is expected to block for at most that long while
/// it watches for the condition. Polling stops as soon as the condition holds, so no further
/// invocations happen after a success. After `tries` invocations without success this fails
/// with [`SieveError::NotNavigated`].
///
/// Errors returned by `action` are logged and count as an attempt.
///
/// Returns the number of invocations it took.
pub(crate) fn poll_until<A, C>(mut action: A, mut settled: C, options: RetryOptions) -> Result<u32, SieveError>
where
    A: FnMut() -> anyhow::Result<()>,
    C: FnMut(Duration) -> bool,
{
    for attempt in 1..=options.tries {
        if let Err(e) = action() {
            warn!("poll_until: attempt {attempt} failed: {e:#}");
        }
        if settled(options.interval) {
            debug!("poll_until: settled after {attempt} attempts");
            return Ok(attempt);
        }
    }
    Err(SieveError::NotNavigated { attempts: options.tries })
}


/// [`poll_until`] where the condition is the page navigating away from where it was
/// when the first attempt was made.
pub(crate) fn repeat_until_navigated<D, A>(page: &D, action: A, options: RetryOptions) -> Result<u32, SieveError>
where
    D: PageDriver + ?Sized,
    A: FnMut() -> anyhow::Result<()>,
{
    let from_url = page.url();
    poll_until(
        action,
        |interval| match page.wait_for_navigation(&from_url, interval) {
            Ok(navigated) => navigated,
            Err(e) => {
                warn!("repeat_until_navigated: {e:#}");
                false
            }
        },
        options,
    )
}


/// A band of delays to pick from at random between processed records.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DelayBand {
    pub(crate) min: Duration,
    pub(crate) max: Duration,
}


impl DelayBand {
    pub(crate) fn pick(&self) -> Duration {
        if self.max <= self.min {
            return self.min;
        }
        let millis = rand::thread_rng().gen_range(self.min.as_millis()..=self.max.as_millis());
        Duration::from_millis(millis as u64)
    }
}


#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn options(tries: u32) -> RetryOptions {
        RetryOptions { tries, interval: Duration::ZERO }
    }

    #[test]
    fn gives_up_after_exactly_the_try_budget() {
        let calls = Cell::new(0);
        let result = poll_until(
            || {
                calls.set(calls.get() + 1);
                Ok(())
            },
            |_| false,
            options(4),
        );
        assert!(matches!(result, Err(SieveError::NotNavigated { attempts: 4 })));
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn stops_on_the_attempt_that_navigates() {
        let calls = Cell::new(0);
        let result = poll_until(
            || {
                calls.set(calls.get() + 1);
                Ok(())
            },
            |_| calls.get() == 3,
            options(10),
        );
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn failing_actions_still_count() {
        let calls = Cell::new(0);
        let result = poll_until(
            || {
                calls.set(calls.get() + 1);
                anyhow::bail!("button missing")
            },
            |_| false,
            options(2),
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn zero_budget_never_invokes() {
        let calls = Cell::new(0);
        let result = poll_until(
            || {
                calls.set(calls.get() + 1);
                Ok(())
            },
            |_| true,
            options(0),
        );
        assert!(result.is_err());
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn navigation_is_detected_on_a_driver() {
        let page = fake::FakePage::with_pages(vec![vec![], vec![]]);
        page.load_results();
        let attempts = repeat_until_navigated(
            &page,
            || page.click(&fake::pagination_selector(2)),
            options(3),
        )
        .unwrap();
        assert_eq!(attempts, 1);
        assert_eq!(page.current_page(), 2);
    }

    #[test]
    fn delay_band_stays_inside_bounds() {
        let band = DelayBand { min: Duration::from_millis(500), max: Duration::from_millis(2000) };
        for _ in 0..100 {
            let delay = band.pick();
            assert!(delay >= band.min && delay <= band.max);
        }
        let fixed = DelayBand { min: Duration::from_millis(7), max: Duration::from_millis(7) };
        assert_eq!(fixed.pick(), Duration::from_millis(7));
    }
}
