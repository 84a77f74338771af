use std::{sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{error, info, trace, warn};

use crate::{browser::PageDriver, job_boards::indeed::Indeed};


/// Runs blocking browser work on tokio's blocking pool.
///
/// The walk holds its thread for the whole run, so every chunk of Chrome work gets a
/// thread of its own instead of sharing a fixed size pool with it.
pub(crate) async fn off_runtime<T, F>(work: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.context("Blocking browser work panicked")
}


/// Keeps clicking away the subscription modal on a fixed cadence while the walk runs.
pub(crate) fn spawn_modal_closer<D: PageDriver + 'static>(indeed: Arc<Indeed<D>>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let indeed = indeed.clone();
            match off_runtime(move || indeed.close_modal_if_there_is()).await {
                Ok(true) => trace!("modal closer: closed a modal"),
                Ok(false) => {}
                Err(e) => error!("modal closer: {e:#}"),
            }
        }
    })
}


/// Watches both tabs for the site's connection security interstitial.
pub(crate) struct SecurityCheck {
    marker: String,
    previous_urls: Option<(String, String)>,
    showing: bool,
}


impl SecurityCheck {
    pub(crate) fn new(marker: impl Into<String>) -> Self {
        Self { marker: marker.into(), previous_urls: None, showing: false }
    }

    /// Looks at the tabs again if either of them moved since the last poll.
    ///
    /// Returns true only on the poll where the interstitial first shows up.
    pub(crate) fn poll<D: PageDriver>(&mut self, indeed: &Indeed<D>) -> anyhow::Result<bool> {
        let urls = (indeed.page().url(), indeed.api_page().url());
        if self.previous_urls.as_ref() == Some(&urls) {
            return Ok(false);
        }

        let present = indeed.page().content()?.contains(&self.marker)
            || indeed.api_page().content()?.contains(&self.marker);
        let appeared = present && !self.showing;
        self.showing = present;
        self.previous_urls = Some(urls);
        Ok(appeared)
    }
}


pub(crate) fn spawn_security_watch<D: PageDriver + 'static>(
    indeed: Arc<Indeed<D>>,
    every: Duration,
    mut check: SecurityCheck,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let indeed = indeed.clone();
            let polled = off_runtime(move || {
                let result = check.poll(indeed.as_ref());
                (check, result)
            })
            .await;
            let (returned, result) = match polled {
                Ok(polled) => polled,
                Err(e) => {
                    error!("security watch stopped: {e:#}");
                    return;
                }
            };
            check = returned;
            match result {
                Ok(true) => warn!("A security check is showing. Solve it in the browser window to let the walk continue"),
                Ok(false) => {}
                Err(e) => info!("security watch: {e:#}"),
            }
        }
    })
}
