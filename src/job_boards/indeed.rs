use std::{path::{Path, PathBuf}, time::Duration};

use anyhow::Context;
use scraper::{Html, Selector};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::{AllJobs, JobList, JobPosting, SearchQuery, ViewJobBody, ViewJobResponse};
use crate::{browser::{repeat_until_navigated, ElementInfo, PageDriver, RetryOptions}, error::SieveError};

pub(crate) const INDEED_HOME_URL: &str = "https://de.indeed.com/";
pub(crate) const JOB_TITLE_SELECTOR: &str = "span[id^=jobTitle-]";
const JOB_TITLE_ID_PREFIX: &str = "jobTitle-";
const JOB_COUNT_SELECTOR: &str = ".jobsearch-JobCountAndSortPane-jobCount > span";
const CLOSE_MODAL_SELECTOR: &str = r#"[aria-label="schließen"]"#;
const CARD_CLASS: &str = "cardOutline";


fn pagination_selector(page: u32) -> String {
    format!(r#"nav[aria-label=pagination] a[aria-label="{page}"]"#)
}


fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow::anyhow!("Invalid selector {css}: {e:?}"))
}


/// Knobs for a session, usually filled from the config file.
#[derive(Debug, Clone)]
pub(crate) struct IndeedSettings {
    pub(crate) home_url: Url,
    /// Retry budget for a single click-until-navigated.
    pub(crate) navigation: RetryOptions,
    /// How many reload-and-retry rounds a page advance gets.
    pub(crate) page_advance_attempts: u32,
    pub(crate) page_advance_backoff: Duration,
    pub(crate) selector_timeout: Duration,
    pub(crate) modal_timeout: Duration,
    /// Where to drop a capture of the results tab when pagination gives up.
    pub(crate) screenshot_dir: Option<PathBuf>,
}


impl Default for IndeedSettings {
    fn default() -> Self {
        Self {
            home_url: Url::parse(INDEED_HOME_URL).expect("Home URL constant should be valid"),
            navigation: RetryOptions::default(),
            page_advance_attempts: 3,
            page_advance_backoff: Duration::from_secs(2),
            selector_timeout: Duration::from_secs(10),
            modal_timeout: Duration::from_millis(100),
            screenshot_dir: None,
        }
    }
}


/// A session on Indeed, driving one tab the user can watch and one tab for detail requests.
pub(crate) struct Indeed<D> {
    page: D,
    api_page: D,
    jobs_url: Url,
    view_job_url: Url,
    settings: IndeedSettings,
}


impl<D: PageDriver> Indeed<D> {
    pub(crate) fn new(page: D, api_page: D, settings: IndeedSettings) -> anyhow::Result<Self> {
        let jobs_url = settings.home_url.join("jobs").context("Failed to derive the jobs URL")?;
        let view_job_url = settings.home_url.join("viewjob").context("Failed to derive the viewjob URL")?;
        Ok(Self { page, api_page, jobs_url, view_job_url, settings })
    }

    pub(crate) fn page(&self) -> &D {
        &self.page
    }

    pub(crate) fn api_page(&self) -> &D {
        &self.api_page
    }

    /// Loads the site root.
    pub(crate) fn navigate_home(&self) -> anyhow::Result<()> {
        self.page.navigate(self.settings.home_url.as_str()).inspect_err(|e| error!("navigate_home: {e:#}"))
    }

    /// Loads the results page for `query`.
    pub(crate) fn search(&self, query: &SearchQuery) -> anyhow::Result<()> {
        let url = self.search_url(query);
        info!("Searching {url}");
        self.page.navigate(url.as_str()).inspect_err(|e| error!("search: {e:#}"))
    }

    pub(crate) fn search_url(&self, query: &SearchQuery) -> Url {
        let mut url = self.jobs_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", &query.keyword).append_pair("l", &query.location);
            if let Some(distance) = query.distance {
                pairs.append_pair("radius", &distance.km().to_string());
            }
        }
        url
    }

    /// The link a human would follow to see `job_id` next to the current results.
    pub(crate) fn job_url(&self, job_id: &str) -> String {
        let mut url = self.jobs_url.clone();
        let current = Url::parse(&self.page.url()).ok();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(current) = &current {
                pairs.extend_pairs(current.query_pairs().filter(|(k, _)| k != "vjk"));
            }
            pairs.append_pair("vjk", job_id);
        }
        url.into()
    }

    /// Reads the results count label, falling back to 0 when it is missing or unreadable.
    pub(crate) fn job_count(&self) -> u64 {
        let label = self
            .page
            .wait_for_selector(JOB_COUNT_SELECTOR, self.settings.selector_timeout)
            .and_then(|_| self.page.query_elements(JOB_COUNT_SELECTOR));
        match label {
            Ok(elements) => elements.first().map(|e| parse_job_count(&e.text)).unwrap_or(0),
            Err(e) => {
                warn!("job_count: {e:#}");
                0
            }
        }
    }

    /// Clicks away the subscription modal if it is showing.
    ///
    /// Returns whether a modal was closed. Absence of the modal is not an error.
    pub(crate) fn close_modal_if_there_is(&self) -> bool {
        if self.page.wait_for_selector(CLOSE_MODAL_SELECTOR, self.settings.modal_timeout).is_err() {
            return false;
        }
        match self.page.click(CLOSE_MODAL_SELECTOR) {
            Ok(()) => {
                debug!("Closed the subscription modal");
                true
            }
            Err(e) => {
                trace!("close_modal_if_there_is: {e:#}");
                false
            }
        }
    }

    /// The job title spans of the results page currently loaded.
    pub(crate) fn job_titles(&self) -> anyhow::Result<Vec<ElementInfo>> {
        self.page.wait_for_selector(JOB_TITLE_SELECTOR, self.settings.selector_timeout)?;
        self.page.query_elements(JOB_TITLE_SELECTOR)
    }

    /// Requests the detail payload of `job_id` in the api tab.
    pub(crate) fn job_info(&self, job_id: &str) -> anyhow::Result<JobPosting> {
        let mut url = self.view_job_url.clone();
        url.query_pairs_mut()
            .append_pair("jk", job_id)
            .append_pair("from", "hp")
            .append_pair("viewType", "embedded")
            .append_pair("spa", "1")
            .append_pair("hidecmpheader", "0")
            .append_pair("hostrendertype", "federated")
            .append_pair("hostId", "homepage");

        self.api_page.navigate(url.as_str())?;
        self.api_page.wait_for_selector("pre", self.settings.selector_timeout)?;
        let raw = self
            .api_page
            .query_elements("pre")?
            .into_iter()
            .next()
            .ok_or_else(|| SieveError::MissingElement("pre".into()))?
            .text;

        let response: ViewJobResponse = serde_json::from_str(&raw).context("Detail payload is not JSON")?;
        if response.status != "success" {
            return Err(SieveError::DetailStatus(response.status).into());
        }
        let body: ViewJobBody = serde_json::from_value(response.body).context("Detail payload has an unexpected shape")?;
        let model = body.job_info_wrapper_model.job_info_model;

        Ok(JobPosting {
            job_id: job_id.to_string(),
            job_title: model.job_info_header_model.job_title,
            company_name: model.job_info_header_model.company_name,
            job_description: model.sanitized_job_description,
            url: self.job_url(job_id),
        })
    }

    /// Reads what the results card of `job_id` shows, without leaving the results page.
    pub(crate) fn job_from_card(&self, job_id: &str) -> anyhow::Result<JobPosting> {
        let element_id = serde_json::to_string(&format!("{JOB_TITLE_ID_PREFIX}{job_id}"))?;
        let script = format!(
            r#"(() => {{
                let el = document.getElementById({element_id});
                while (el && !(el.classList && el.classList.contains("{CARD_CLASS}"))) el = el.parentElement;
                return el ? el.outerHTML : null;
            }})()"#
        );
        let card = match self.page.evaluate(&script)? {
            serde_json::Value::String(html) => html,
            _ => return Err(SieveError::MissingElement(format!(".{CARD_CLASS} around {job_id}")).into()),
        };
        let mut posting = parse_job_card(&card)?;
        posting.job_id = job_id.to_string();
        posting.url = self.job_url(job_id);
        Ok(posting)
    }

    /// The detail payload when the endpoint cooperates, otherwise whatever the card shows.
    pub(crate) fn job_details(&self, job_id: &str) -> anyhow::Result<JobPosting> {
        match self.job_info(job_id) {
            Ok(posting) => Ok(posting),
            Err(e) => {
                warn!("job_info {job_id}: {e:#}; reading the results card instead");
                self.job_from_card(job_id).with_context(|| format!("Failed to fetch {job_id}"))
            }
        }
    }

    /// Moves the results to page `page_number`.
    ///
    /// Returns `Ok(false)` when the results show no control for that page, which means the
    /// walk has reached the last page. Each round clicks the control until the tab navigates;
    /// a round that runs out of tries reloads the results and waits before the next one.
    ///
    /// Only the results as first found can end the walk. A control that is gone after a
    /// reload (an interstitial, an error page) counts as a failed round.
    pub(crate) fn advance_page(&self, page_number: u32) -> anyhow::Result<bool> {
        let control = pagination_selector(page_number);
        let attempts = self.settings.page_advance_attempts;

        for attempt in 1..=attempts {
            let round: anyhow::Result<u32> =
                if self.page.wait_for_selector(&control, self.settings.selector_timeout).is_ok() {
                    repeat_until_navigated(&self.page, || self.page.click(&control), self.settings.navigation)
                        .map_err(Into::into)
                } else if attempt == 1 {
                    debug!("No control for page {page_number}, this was the last page");
                    return Ok(false);
                } else {
                    Err(SieveError::MissingElement(control.clone()).into())
                };
            match round {
                Ok(_) => {
                    info!("Moved to page {page_number}");
                    return Ok(true);
                }
                Err(e) => warn!("advance_page {page_number} (round {attempt}/{attempts}): {e}"),
            }
            if attempt < attempts {
                std::thread::sleep(self.settings.page_advance_backoff);
                let current = self.page.url();
                if let Err(e) = self.page.navigate(&current) {
                    error!("advance_page: reload failed: {e:#}");
                }
            }
        }

        if let Some(dir) = &self.settings.screenshot_dir {
            let path = dir.join(format!("page-{page_number}-failure.png"));
            match self.capture(&path) {
                Ok(()) => info!("Saved a capture of the results tab to {}", path.display()),
                Err(e) => error!("capture: {e:#}"),
            }
        }
        Err(SieveError::PageAdvance { page: page_number, attempts }.into())
    }

    /// Writes a PNG of the results tab to `path`.
    pub(crate) fn capture(&self, path: &Path) -> anyhow::Result<()> {
        let png = self.page.screenshot()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, png).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Listings on the results page currently loaded.
    pub(crate) fn job_list(&self) -> JobList<'_, D> {
        JobList::new(self)
    }

    /// Listings on every results page from the current one onwards.
    pub(crate) fn all_jobs(&self) -> AllJobs<'_, D> {
        AllJobs::new(self)
    }
}


/// Pulls the job id out of a title span's id attribute.
pub(crate) fn job_id_from_title(element: &ElementInfo) -> Option<&str> {
    element
        .id
        .as_deref()?
        .strip_prefix(JOB_TITLE_ID_PREFIX)
        .filter(|id| !id.is_empty())
}


/// The first whitespace separated token that reads as a number once thousands separators
/// are dropped, or 0.
pub(crate) fn parse_job_count(text: &str) -> u64 {
    text.split_whitespace()
        .find_map(|token| token.replace([',', '.'], "").parse::<u64>().ok())
        .unwrap_or(0)
}


/// Extracts title, company and snippet from the HTML of a results card.
pub(crate) fn parse_job_card(html: &str) -> anyhow::Result<JobPosting> {
    let card = Html::parse_fragment(html);
    let text_of = |css: &str| -> anyhow::Result<Option<String>> {
        Ok(card
            .select(&selector(css)?)
            .next()
            .map(|x| x.text().map(|x| x.replace('\u{a0}', " ")).collect::<String>().trim().to_string()))
    };

    let job_title = text_of("h2.jobTitle")?
        .or(text_of(JOB_TITLE_SELECTOR)?)
        .ok_or_else(|| SieveError::MissingElement("h2.jobTitle".into()))?;
    let company_name = text_of(r#"[data-testid="company-name"]"#)?.unwrap_or_default();
    let job_description = card
        .select(&selector(".job-snippet")?)
        .next()
        .map(|x| x.inner_html())
        .unwrap_or_default();

    Ok(JobPosting { job_id: String::new(), job_title, company_name, job_description, url: String::new() })
}
