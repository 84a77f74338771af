//! A scripted stand-in for a job board opened in two browser tabs.

use std::{sync::{Arc, Mutex, MutexGuard}, time::Duration};

use serde_json::json;
use url::Url;

use super::{ElementInfo, PageDriver};
use crate::error::SieveError;

pub(crate) const HOME: &str = "https://jobs.example.test/";
pub(crate) const MODAL_SELECTOR: &str = r#"[aria-label="schließen"]"#;
const TITLE_SELECTOR: &str = "span[id^=jobTitle-]";
const COUNT_SELECTOR: &str = ".jobsearch-JobCountAndSortPane-jobCount > span";


pub(crate) fn pagination_selector(page: u32) -> String {
    format!(r#"nav[aria-label=pagination] a[aria-label="{page}"]"#)
}


#[derive(Debug, Clone)]
pub(crate) struct FakeListing {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) company: String,
    pub(crate) description: String,
    /// Whether the detail endpoint answers with a success payload for this listing.
    pub(crate) detail_ok: bool,
    /// Whether the results card can be found around the title.
    pub(crate) card_ok: bool,
}


pub(crate) fn listing(id: &str, title: &str, description: &str) -> FakeListing {
    FakeListing {
        id: id.to_string(),
        title: title.to_string(),
        company: format!("{id} GmbH"),
        description: description.to_string(),
        detail_ok: true,
        card_ok: true,
    }
}


#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub(crate) pages: Vec<Vec<FakeListing>>,
    /// 0 while no results page is loaded.
    pub(crate) current_page: u32,
    pub(crate) url: String,
    pub(crate) api_url: String,
    pub(crate) api_body: String,
    pub(crate) count_label: Option<String>,
    pub(crate) modal_open: bool,
    pub(crate) modal_closes: u32,
    /// Pagination clicks that are swallowed without navigating.
    pub(crate) ignored_clicks: u32,
    pub(crate) pagination_clicks: u32,
    pub(crate) navigations: Vec<String>,
    pub(crate) security_check: bool,
    pub(crate) screenshots: u32,
    pub(crate) fail_navigation: bool,
    /// Navigating the main tab lands on the security interstitial instead of results.
    pub(crate) interstitial_on_reload: bool,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Main,
    Api,
}


#[derive(Clone)]
pub(crate) struct FakePage {
    state: Arc<Mutex<FakeState>>,
    role: Role,
}


impl FakePage {
    /// The main tab of a site whose results span `pages`.
    pub(crate) fn with_pages(pages: Vec<Vec<FakeListing>>) -> Self {
        let state = FakeState { pages, url: "about:blank".to_string(), ..Default::default() };
        Self { state: Arc::new(Mutex::new(state)), role: Role::Main }
    }

    /// The background tab of the same site.
    pub(crate) fn api_tab(&self) -> Self {
        Self { state: self.state.clone(), role: Role::Api }
    }

    pub(crate) fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Puts the main tab on the first results page without going through a search.
    pub(crate) fn load_results(&self) {
        let mut state = self.state();
        state.current_page = 1;
        state.url = format!("{HOME}jobs?q=react&l=Berlin");
    }

    pub(crate) fn current_page(&self) -> u32 {
        self.state().current_page
    }

    fn find_listing<'a>(state: &'a FakeState, id: &str) -> Option<&'a FakeListing> {
        state.pages.iter().flatten().find(|listing| listing.id == id)
    }

    fn page_url(state: &FakeState, page: u32) -> String {
        let base = state.url.split("&start=").next().unwrap_or_default().to_string();
        format!("{base}&start={}", (page - 1) * 10)
    }
}


impl PageDriver for FakePage {
    fn navigate(&self, url: &str) -> anyhow::Result<()> {
        let mut state = self.state();
        if state.fail_navigation {
            anyhow::bail!("net::ERR_CONNECTION_RESET at {url}");
        }
        state.navigations.push(url.to_string());
        match self.role {
            Role::Main => {
                if state.interstitial_on_reload {
                    state.current_page = 0;
                    state.security_check = true;
                } else if url.contains("/jobs?") && state.current_page == 0 {
                    state.current_page = 1;
                }
                state.url = url.to_string();
            }
            Role::Api => {
                state.api_url = url.to_string();
                let parsed = Url::parse(url)?;
                let id = parsed
                    .query_pairs()
                    .find(|(k, _)| k == "jk")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default();
                let body = match Self::find_listing(&state, &id) {
                    Some(listing) if listing.detail_ok => json!({
                        "status": "success",
                        "body": {
                            "jobInfoWrapperModel": {
                                "jobInfoModel": {
                                    "jobInfoHeaderModel": {
                                        "companyName": listing.company,
                                        "jobTitle": listing.title,
                                    },
                                    "sanitizedJobDescription": listing.description,
                                }
                            }
                        }
                    })
                    .to_string(),
                    _ => json!({ "status": "error", "body": {} }).to_string(),
                };
                state.api_body = body;
            }
        }
        Ok(())
    }

    fn url(&self) -> String {
        let state = self.state();
        match self.role {
            Role::Main => state.url.clone(),
            Role::Api => state.api_url.clone(),
        }
    }

    fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> anyhow::Result<()> {
        if self.query_elements(selector)?.is_empty() {
            return Err(SieveError::MissingElement(selector.to_string()).into());
        }
        Ok(())
    }

    fn query_elements(&self, selector: &str) -> anyhow::Result<Vec<ElementInfo>> {
        let state = self.state();
        if self.role == Role::Api {
            if selector == "pre" && !state.api_body.is_empty() {
                return Ok(vec![ElementInfo { id: None, text: state.api_body.clone() }]);
            }
            return Ok(vec![]);
        }

        if selector == TITLE_SELECTOR {
            let Some(listings) = state.pages.get(state.current_page.wrapping_sub(1) as usize) else {
                return Ok(vec![]);
            };
            return Ok(listings
                .iter()
                .map(|listing| ElementInfo {
                    id: Some(format!("jobTitle-{}", listing.id)),
                    text: listing.title.clone(),
                })
                .collect());
        }
        if selector == MODAL_SELECTOR && state.modal_open {
            return Ok(vec![ElementInfo::default()]);
        }
        if selector == COUNT_SELECTOR {
            return Ok(state
                .count_label
                .iter()
                .map(|text| ElementInfo { text: text.clone(), ..Default::default() })
                .collect());
        }
        if state.current_page > 0 {
            for page in 1..=state.pages.len() as u32 {
                if selector == pagination_selector(page) {
                    return Ok(vec![ElementInfo { text: page.to_string(), ..Default::default() }]);
                }
            }
        }
        Ok(vec![])
    }

    fn click(&self, selector: &str) -> anyhow::Result<()> {
        if self.query_elements(selector)?.is_empty() {
            return Err(SieveError::MissingElement(selector.to_string()).into());
        }
        let mut state = self.state();
        if selector == MODAL_SELECTOR {
            state.modal_open = false;
            state.modal_closes += 1;
            return Ok(());
        }
        for page in 1..=state.pages.len() as u32 {
            if selector == pagination_selector(page) {
                state.pagination_clicks += 1;
                if state.ignored_clicks > 0 {
                    state.ignored_clicks -= 1;
                    return Ok(());
                }
                state.current_page = page;
                state.url = Self::page_url(&state, page);
                return Ok(());
            }
        }
        Ok(())
    }

    fn evaluate(&self, expression: &str) -> anyhow::Result<serde_json::Value> {
        let state = self.state();
        let listing = state
            .pages
            .iter()
            .flatten()
            .find(|listing| listing.card_ok && expression.contains(&format!("jobTitle-{}\"", listing.id)));
        Ok(match listing {
            Some(listing) => serde_json::Value::String(format!(
                r#"<div class="cardOutline tapItem"><h2 class="jobTitle"><a><span id="jobTitle-{}">{}</span></a></h2><span data-testid="company-name">{}</span><div class="job-snippet"><ul><li>{}</li></ul></div></div>"#,
                listing.id, listing.title, listing.company, listing.description
            )),
            None => serde_json::Value::Null,
        })
    }

    fn wait_for_navigation(&self, from_url: &str, _timeout: Duration) -> anyhow::Result<bool> {
        Ok(self.url() != from_url)
    }

    fn content(&self) -> anyhow::Result<String> {
        let state = self.state();
        if state.security_check && self.role == Role::Main {
            return Ok("<html><body>Checking if the site connection is secure</body></html>".to_string());
        }
        Ok(match self.role {
            Role::Main => format!("<html><body>{}</body></html>", state.url),
            Role::Api => format!("<html><body><pre>{}</pre></body></html>", state.api_body),
        })
    }

    fn screenshot(&self) -> anyhow::Result<Vec<u8>> {
        self.state().screenshots += 1;
        Ok(b"\x89PNG\r\n\x1a\n".to_vec())
    }
}
