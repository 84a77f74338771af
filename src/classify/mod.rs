use std::{fmt, sync::OnceLock};

use regex::Regex;

use crate::job_boards::JobPosting;


/// The profile a run keeps listings for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum JobType {
    #[value(name = "intern")]
    Intern,
    #[value(name = "junior_react")]
    JuniorReact,
}


/// Why a listing was kept or dropped. Checks run in declaration order and stop at the first
/// one that fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Accepted,
    SeniorOrLead,
    OffTopic,
    ExcludedVariant,
    NonTargetLanguage,
}


impl Verdict {
    pub(crate) fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}


impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Accepted => "accepted",
            Self::SeniorOrLead => "senior or lead position",
            Self::OffTopic => "not a matching position",
            Self::ExcludedVariant => "excluded variant",
            Self::NonTargetLanguage => "is a German position",
        })
    }
}


/// Hand-tuned keyword rules for one profile. Every keyword is lower case.
pub(crate) struct Rules {
    pub(crate) seniority: &'static [&'static str],
    pub(crate) title_topics: &'static [&'static str],
    pub(crate) description_topics: &'static [&'static str],
    pub(crate) excluded_title_variants: &'static [&'static str],
}


const SENIORITY: &[&str] = &["senior", "lead"];

const JUNIOR_REACT: Rules = Rules {
    seniority: SENIORITY,
    title_topics: &["front", "react"],
    description_topics: &["react"],
    excluded_title_variants: &["react native"],
};

const INTERN: Rules = Rules {
    seniority: SENIORITY,
    title_topics: &["intern"],
    description_topics: &["intern"],
    excluded_title_variants: &[],
};


/// Occurrence thresholds that mark a description as written in German.
const GERMAN_MARKERS: &[(&str, usize)] = &[("wir ", 2), ("du ", 5)];
/// Phrases that keep a German looking description in play.
const LANGUAGE_OPT_OUTS: &[&str] = &["german is a plus", "international"];


impl JobType {
    pub(crate) fn rules(self) -> &'static Rules {
        match self {
            Self::Intern => &INTERN,
            Self::JuniorReact => &JUNIOR_REACT,
        }
    }

    pub(crate) fn classify(self, posting: &JobPosting) -> Verdict {
        classify(self.rules(), &posting.job_title, &posting.job_description)
    }
}


fn tag_regex() -> &'static Regex {
    static TAGS: OnceLock<Regex> = OnceLock::new();
    TAGS.get_or_init(|| Regex::new("<[^>]*>").expect("Tag pattern should compile"))
}


/// Removes everything that looks like an HTML tag.
pub(crate) fn strip_tags(html: &str) -> String {
    tag_regex().replace_all(html, "").into_owned()
}


/// Non-overlapping occurrences of `word` in `text`.
pub(crate) fn count_word(text: &str, word: &str) -> usize {
    text.matches(word).count()
}


/// Whether a lower cased, tag stripped description reads as German.
pub(crate) fn is_german(description: &str) -> bool {
    let looks_german = GERMAN_MARKERS
        .iter()
        .any(|&(word, threshold)| count_word(description, word) >= threshold);
    looks_german && !LANGUAGE_OPT_OUTS.iter().any(|phrase| description.contains(phrase))
}


pub(crate) fn classify(rules: &Rules, title: &str, description_html: &str) -> Verdict {
    let title = title.to_lowercase();
    let description = strip_tags(description_html).to_lowercase();
    let any_in = |text: &str, words: &[&str]| words.iter().any(|w| text.contains(w));

    if any_in(&title, rules.seniority) {
        return Verdict::SeniorOrLead;
    }
    if !any_in(&title, rules.title_topics) && !any_in(&description, rules.description_topics) {
        return Verdict::OffTopic;
    }
    if any_in(&title, rules.excluded_title_variants) {
        return Verdict::ExcludedVariant;
    }
    if is_german(&description) {
        return Verdict::NonTargetLanguage;
    }
    Verdict::Accepted
}
