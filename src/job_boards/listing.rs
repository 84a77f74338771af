use std::iter::FusedIterator;

use tracing::{error, info, warn};

use super::{indeed::{job_id_from_title, Indeed}, JobPosting, JobRecord};
use crate::browser::{ElementInfo, PageDriver};


/// Listings on one results page, fetched one at a time as the iterator is advanced.
///
/// The first listing is skipped since the page opens with it already selected. Listings that
/// cannot be read are logged and skipped. Once exhausted it stays exhausted.
pub(crate) struct JobList<'a, D> {
    indeed: &'a Indeed<D>,
    titles: Option<std::vec::IntoIter<ElementInfo>>,
}


impl<'a, D: PageDriver> JobList<'a, D> {
    pub(super) fn new(indeed: &'a Indeed<D>) -> Self {
        Self { indeed, titles: None }
    }

    fn titles(&mut self) -> &mut std::vec::IntoIter<ElementInfo> {
        let indeed = self.indeed;
        self.titles.get_or_insert_with(|| {
            let titles = indeed.job_titles().unwrap_or_else(|e| {
                error!("job_titles: {e:#}");
                vec![]
            });
            let mut titles = titles.into_iter();
            titles.next();
            titles
        })
    }
}


impl<D: PageDriver> Iterator for JobList<'_, D> {
    type Item = JobPosting;

    fn next(&mut self) -> Option<Self::Item> {
        let indeed = self.indeed;
        for title in self.titles() {
            let Some(job_id) = job_id_from_title(&title) else {
                warn!("Job title without a job id: {:?}", title.id);
                continue;
            };
            match indeed.job_details(job_id) {
                Ok(posting) => return Some(posting),
                Err(e) => warn!("Failed to fetch {job_id}: {e:#}"),
            }
        }
        None
    }
}


impl<D: PageDriver> FusedIterator for JobList<'_, D> {}


/// Listings across the current results page and every page after it.
///
/// Each record is tagged with its position in the walk and the page it was found on. The walk
/// ends after the last page, or when moving to the next page fails for good.
pub(crate) struct AllJobs<'a, D> {
    indeed: &'a Indeed<D>,
    current: Option<JobList<'a, D>>,
    page_number: u32,
    idx: u32,
}


impl<'a, D: PageDriver> AllJobs<'a, D> {
    pub(super) fn new(indeed: &'a Indeed<D>) -> Self {
        Self { indeed, current: Some(indeed.job_list()), page_number: 1, idx: 0 }
    }
}


impl<D: PageDriver> Iterator for AllJobs<'_, D> {
    type Item = JobRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let list = self.current.as_mut()?;
            if let Some(posting) = list.next() {
                let record = JobRecord { posting, idx: self.idx, page_number: self.page_number };
                self.idx += 1;
                return Some(record);
            }

            self.current = None;
            let next_page = self.page_number + 1;
            match self.indeed.advance_page(next_page) {
                Ok(true) => {
                    self.page_number = next_page;
                    self.current = Some(self.indeed.job_list());
                }
                Ok(false) => info!("Page {} was the last results page", self.page_number),
                Err(e) => error!("advance_page: {e:#}"),
            }
        }
    }
}


impl<D: PageDriver> FusedIterator for AllJobs<'_, D> {}
