use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use url::Url;
use validator::{Validate, ValidationError};

use crate::{
    browser::{chrome::LaunchSettings, DelayBand, RetryOptions},
    job_boards::indeed::{IndeedSettings, INDEED_HOME_URL},
};


/// Settings read from `config.toml`. Every field is optional in the file.
#[derive(Debug, Deserialize, Validate)]
#[serde(default, deny_unknown_fields)]
#[validate(schema(function = "validate_delay_band"))]
pub(crate) struct Config {
    /// Root of the job board. Search and detail URLs are derived from it.
    #[validate(url)]
    pub(crate) home_url: String,
    /// Where the matches file is written.
    pub(crate) output_dir: PathBuf,
    /// Run Chrome without a window.
    ///
    /// The site is more likely to show a security check to a headless browser.
    pub(crate) headless: bool,
    #[validate(range(min = 320))]
    pub(crate) window_width: u32,
    #[validate(range(min = 240))]
    pub(crate) window_height: u32,
    /// Pause between loading the home page and searching.
    pub(crate) startup_delay_ms: u64,
    /// Lower end of the pause after each processed listing.
    pub(crate) min_delay_ms: u64,
    /// Upper end of the pause after each processed listing.
    pub(crate) max_delay_ms: u64,
    /// Clicks allowed on a pagination control before it counts as stuck.
    #[validate(range(min = 1))]
    pub(crate) navigation_tries: u32,
    pub(crate) navigation_interval_ms: u64,
    /// Reload-and-retry rounds for moving to the next page.
    #[validate(range(min = 1))]
    pub(crate) page_advance_attempts: u32,
    pub(crate) page_advance_backoff_ms: u64,
    pub(crate) selector_timeout_ms: u64,
    /// How often the subscription modal is looked for.
    #[validate(range(min = 1))]
    pub(crate) modal_check_interval_ms: u64,
    pub(crate) modal_timeout_ms: u64,
    #[validate(range(min = 1))]
    pub(crate) security_check_interval_ms: u64,
    /// Text that only appears on the site's connection security interstitial.
    #[validate(length(min = 1))]
    pub(crate) security_check_string: String,
    /// Save a capture of the results tab next to the output when pagination gives up.
    pub(crate) screenshot_on_failure: bool,
}


impl Default for Config {
    fn default() -> Self {
        Self {
            home_url: INDEED_HOME_URL.to_string(),
            output_dir: PathBuf::from("results"),
            headless: false,
            window_width: 1440,
            window_height: 900,
            startup_delay_ms: 3000,
            min_delay_ms: 500,
            max_delay_ms: 2000,
            navigation_tries: 10,
            navigation_interval_ms: 1000,
            page_advance_attempts: 3,
            page_advance_backoff_ms: 2000,
            selector_timeout_ms: 10_000,
            modal_check_interval_ms: 1000,
            modal_timeout_ms: 100,
            security_check_interval_ms: 5000,
            security_check_string: "Checking if the site connection is secure".to_string(),
            screenshot_on_failure: true,
        }
    }
}


fn validate_delay_band(config: &Config) -> Result<(), ValidationError> {
    if config.min_delay_ms > config.max_delay_ms {
        return Err(ValidationError::new("min_delay_ms must not exceed max_delay_ms"));
    }
    Ok(())
}


impl Config {
    /// Reads and validates `path`. A missing file yields the defaults.
    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) => Self::parse(&text).with_context(|| format!("Invalid config in {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };
        Ok(config)
    }

    pub(crate) fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings { headless: self.headless, window_size: (self.window_width, self.window_height) }
    }

    pub(crate) fn indeed_settings(&self) -> anyhow::Result<IndeedSettings> {
        Ok(IndeedSettings {
            home_url: Url::parse(&self.home_url)?,
            navigation: RetryOptions {
                tries: self.navigation_tries,
                interval: Duration::from_millis(self.navigation_interval_ms),
            },
            page_advance_attempts: self.page_advance_attempts,
            page_advance_backoff: Duration::from_millis(self.page_advance_backoff_ms),
            selector_timeout: Duration::from_millis(self.selector_timeout_ms),
            modal_timeout: Duration::from_millis(self.modal_timeout_ms),
            screenshot_dir: self.screenshot_on_failure.then(|| self.output_dir.clone()),
        })
    }

    pub(crate) fn delay_band(&self) -> DelayBand {
        DelayBand {
            min: Duration::from_millis(self.min_delay_ms),
            max: Duration::from_millis(self.max_delay_ms),
        }
    }
}
