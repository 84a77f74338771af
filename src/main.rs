use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use fxhash::FxHashSet;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::{
    browser::{chrome, DelayBand, PageDriver},
    classify::JobType,
    config::Config,
    job_boards::{indeed::Indeed, DistanceBand, SearchQuery},
    sink::MatchSet,
    watchers::SecurityCheck,
};

mod browser;
mod classify;
mod config;
mod error;
mod job_boards;
mod sink;
mod watchers;


/// Walks job search results in a Chrome window and keeps the listings that fit a profile.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// What to search for, e.g. "React developer"
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
    keyword: String,
    /// Where to search, e.g. "Deutschland"
    #[arg(value_parser = clap::builder::NonEmptyStringValueParser::new())]
    location: String,
    /// Which listings to keep
    mode: JobType,
    /// Search radius in kilometres
    distance: Option<DistanceBand>,
    /// Settings file; defaults are used when it does not exist
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    config: PathBuf,
    /// Overrides `output_dir` from the settings file
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,
    /// Overrides `headless` from the settings file
    #[arg(long)]
    headless: bool,
}


fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("job_sieve=info")))
        .compact()
        .with_target(false)
        .init();
}


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();

    let mut config = Config::load(&args.config)?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    config.headless |= args.headless;

    let query = SearchQuery { keyword: args.keyword, location: args.location, distance: args.distance };
    let output = sink::output_path(&config.output_dir, &query.keyword, chrono::Local::now());

    let (_browser, main_tab, api_tab) = chrome::launch(&config.launch_settings())?;
    let indeed = Arc::new(Indeed::new(main_tab, api_tab, config.indeed_settings()?)?);

    let modal_closer = watchers::spawn_modal_closer(
        indeed.clone(),
        Duration::from_millis(config.modal_check_interval_ms),
    );
    let security_watch = watchers::spawn_security_watch(
        indeed.clone(),
        Duration::from_millis(config.security_check_interval_ms),
        SecurityCheck::new(config.security_check_string.clone()),
    );

    let walk = Walk {
        query,
        mode: args.mode,
        output,
        startup_delay: Duration::from_millis(config.startup_delay_ms),
        delay: config.delay_band(),
    };
    let result = watchers::off_runtime(move || walk.run(indeed.as_ref())).await;

    modal_closer.abort();
    security_watch.abort();

    let matches = result??;
    for record in matches.records() {
        println!("{} ({}): {}", record.posting.job_title, record.posting.company_name, record.posting.url);
    }
    println!("Done! Kept {} listings in {}", matches.len(), matches.path().display());
    Ok(())
}


/// One pass over the search results: search, then classify and persist every listing.
struct Walk {
    query: SearchQuery,
    mode: JobType,
    output: PathBuf,
    startup_delay: Duration,
    delay: DelayBand,
}


impl Walk {
    fn run<D: PageDriver>(self, indeed: &Indeed<D>) -> anyhow::Result<MatchSet> {
        indeed.navigate_home().context("Failed to open the home page")?;
        std::thread::sleep(self.startup_delay);
        indeed.search(&self.query).context("Failed to open the search results")?;
        info!("{} listings found for {:?} in {:?}", indeed.job_count(), self.query.keyword, self.query.location);

        let mut matches = MatchSet::new(self.output);
        let mut seen = FxHashSet::default();
        for record in indeed.all_jobs() {
            if !seen.insert(record.posting.job_id.clone()) {
                warn!("Listing {} showed up again on page {}", record.posting.job_id, record.page_number);
            }

            let verdict = self.mode.classify(&record.posting);
            if verdict.is_accepted() {
                info!(
                    "#{} (page {}) kept: {} at {}",
                    record.idx, record.page_number, record.posting.job_title, record.posting.company_name
                );
                matches.push(record)?;
            } else {
                debug!("#{} {}: {verdict}", record.idx, record.posting.job_title);
            }

            std::thread::sleep(self.delay.pick());
        }

        Ok(matches)
    }
}
