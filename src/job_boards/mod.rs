use serde::{Deserialize, Serialize};

pub(crate) mod indeed;
mod listing;

pub(crate) use listing::{AllJobs, JobList};


/// Search radius offered by the results page, in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum DistanceBand {
    #[value(name = "10")]
    Km10,
    #[value(name = "25")]
    Km25,
    #[value(name = "35")]
    Km35,
    #[value(name = "50")]
    Km50,
    #[value(name = "75")]
    Km75,
    #[value(name = "100")]
    Km100,
}


impl DistanceBand {
    pub(crate) fn km(self) -> u32 {
        match self {
            Self::Km10 => 10,
            Self::Km25 => 25,
            Self::Km35 => 35,
            Self::Km50 => 50,
            Self::Km75 => 75,
            Self::Km100 => 100,
        }
    }
}


#[derive(Debug, Clone)]
pub(crate) struct SearchQuery {
    pub(crate) keyword: String,
    pub(crate) location: String,
    pub(crate) distance: Option<DistanceBand>,
}


/// One listing as read from the site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobPosting {
    pub(crate) job_id: String,
    pub(crate) job_title: String,
    pub(crate) company_name: String,
    /// Raw HTML until the record is about to be written out.
    pub(crate) job_description: String,
    pub(crate) url: String,
}


/// A listing tagged with where it was found during a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobRecord {
    #[serde(flatten)]
    pub(crate) posting: JobPosting,
    /// Position in the whole walk, starting at 0.
    pub(crate) idx: u32,
    /// Results page the listing was on, starting at 1.
    pub(crate) page_number: u32,
}


impl JobRecord {
    /// The same record with its description blanked, which is how it is persisted.
    pub(crate) fn without_description(mut self) -> Self {
        self.posting.job_description.clear();
        self
    }
}


/// Payload of the per-listing detail endpoint.
///
/// The body is only meaningful when the status reads `success`, so it is kept raw until then.
#[derive(Debug, Deserialize)]
pub(crate) struct ViewJobResponse {
    pub(crate) status: String,
    #[serde(default)]
    pub(crate) body: serde_json::Value,
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewJobBody {
    pub(crate) job_info_wrapper_model: JobInfoWrapperModel,
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInfoWrapperModel {
    pub(crate) job_info_model: JobInfoModel,
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInfoModel {
    pub(crate) job_info_header_model: JobInfoHeaderModel,
    #[serde(default)]
    pub(crate) sanitized_job_description: String,
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JobInfoHeaderModel {
    pub(crate) company_name: String,
    pub(crate) job_title: String,
}
