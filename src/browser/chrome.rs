use std::{sync::Arc, time::{Duration, Instant}};

use anyhow::Context;
use headless_chrome::{Browser, LaunchOptionsBuilder, Tab, protocol::cdp::Page::CaptureScreenshotFormatOption};

use super::{ElementInfo, PageDriver};

const NAVIGATION_POLL: Duration = Duration::from_millis(100);


/// A Chrome tab driven over the devtools protocol.
#[derive(Clone)]
pub(crate) struct ChromeTab(Arc<Tab>);


pub(crate) struct LaunchSettings {
    pub(crate) headless: bool,
    pub(crate) window_size: (u32, u32),
}


/// Launches Chrome and opens the two tabs a session needs: one for the results the user
/// watches, one for fetching listing details in the background.
///
/// The [`Browser`] must be kept alive for as long as the tabs are used.
pub(crate) fn launch(settings: &LaunchSettings) -> anyhow::Result<(Browser, ChromeTab, ChromeTab)> {
    let options = LaunchOptionsBuilder::default()
        .headless(settings.headless)
        .window_size(Some(settings.window_size))
        .idle_browser_timeout(Duration::from_secs(60 * 60))
        .build()
        .map_err(|e| anyhow::anyhow!("Invalid browser launch options: {e}"))?;
    let browser = Browser::new(options).context("Failed to launch Chrome. Is it installed?")?;

    let main = browser.new_tab().context("Failed to open the main tab")?;
    let api = browser.new_tab().context("Failed to open the api tab")?;
    for tab in [&main, &api] {
        tab.enable_stealth_mode()?;
    }

    Ok((browser, ChromeTab(main), ChromeTab(api)))
}


impl PageDriver for ChromeTab {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        self.0
            .navigate_to(url)?
            .wait_until_navigated()
            .with_context(|| format!("Failed to load {url}"))?;
        Ok(())
    }

    fn url(&self) -> String {
        self.0.get_url()
    }

    fn wait_for_selector(&self, selector: &str, timeout: Duration) -> anyhow::Result<()> {
        self.0.wait_for_element_with_custom_timeout(selector, timeout)?;
        Ok(())
    }

    fn query_elements(&self, selector: &str) -> anyhow::Result<Vec<ElementInfo>> {
        // find_elements fails when nothing matches
        let Ok(elements) = self.0.find_elements(selector) else {
            return Ok(vec![]);
        };
        elements
            .iter()
            .map(|element| -> anyhow::Result<ElementInfo> {
                Ok(ElementInfo {
                    id: element.get_attribute_value("id")?,
                    text: element.get_inner_text()?,
                })
            })
            .collect()
    }

    fn click(&self, selector: &str) -> anyhow::Result<()> {
        self.0.find_element(selector)?.click()?;
        Ok(())
    }

    fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value> {
        let object = self.0.evaluate(expression, false)?;
        Ok(object.value.unwrap_or(serde_json::Value::Null))
    }

    fn wait_for_navigation(&self, from_url: &str, timeout: Duration) -> anyhow::Result<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.0.get_url() != from_url {
                self.0.wait_until_navigated()?;
                return Ok(true);
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            std::thread::sleep(NAVIGATION_POLL.min(deadline - now));
        }
    }

    fn content(&self) -> anyhow::Result<String> {
        self.0.get_content()
    }

    fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        self.0.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
    }
}
