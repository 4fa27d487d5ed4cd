use chrono::NaiveDate;
use thiserror::Error;
use url::Url;

/// Placeholder entry shown first in the stream pick-list. Never valid at
/// the model boundary; the UI maps it to empty before construction.
pub(crate) const STREAM_SENTINEL: &str = "— Select —";

/// Curated stream categories offered by the pick-list. The model accepts
/// any non-empty stream; only the UI constrains the choices.
pub(crate) const STREAM_OPTIONS: &[&str] = &["AI", "Climate"];

/// Field values exactly as submitted, before any validation.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawIntake {
    pub(crate) date: Option<NaiveDate>,
    pub(crate) stream: String,
    pub(crate) founder_name: String,
    pub(crate) venture_name: String,
    pub(crate) venture_manager_name: String,
    pub(crate) link: String,
    pub(crate) password: String,
    pub(crate) comments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum FieldError {
    #[error("Date is required")]
    DateMissing,
    #[error("Stream is required")]
    StreamEmpty,
    #[error("Founder name cannot be empty")]
    FounderNameEmpty,
    #[error("Venture name cannot be empty")]
    VentureNameEmpty,
    #[error("Venture manager name cannot be empty")]
    VentureManagerNameEmpty,
    #[error("Password cannot be empty")]
    PasswordEmpty,
    #[error("Link must be a valid http(s) URL: {0}")]
    LinkInvalid(String),
}

/// Every violated constraint from one construction attempt, in field order.
#[derive(Debug, Clone, Error)]
#[error("{}", join_problems(.problems))]
pub(crate) struct ValidationError {
    pub(crate) problems: Vec<FieldError>,
}

fn join_problems(problems: &[FieldError]) -> String {
    problems
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A validated intake record. Construct only through [`IntakeRecord::from_raw`];
/// validation happens at construction time, never after.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IntakeRecord {
    pub(crate) date: NaiveDate,
    pub(crate) stream: String,
    pub(crate) founder_name: String,
    pub(crate) venture_name: String,
    pub(crate) venture_manager_name: String,
    pub(crate) link: Url,
    pub(crate) password: String,
    pub(crate) comments: Option<String>,
}

impl IntakeRecord {
    /// Builds a record from raw field values or fails with every violated
    /// constraint at once. Pure; no side effects.
    pub(crate) fn from_raw(raw: &RawIntake) -> Result<Self, ValidationError> {
        let mut problems = Vec::new();

        if raw.date.is_none() {
            problems.push(FieldError::DateMissing);
        }
        if raw.stream.trim().is_empty() {
            problems.push(FieldError::StreamEmpty);
        }
        if raw.founder_name.trim().is_empty() {
            problems.push(FieldError::FounderNameEmpty);
        }
        if raw.venture_name.trim().is_empty() {
            problems.push(FieldError::VentureNameEmpty);
        }
        if raw.venture_manager_name.trim().is_empty() {
            problems.push(FieldError::VentureManagerNameEmpty);
        }
        if raw.password.trim().is_empty() {
            problems.push(FieldError::PasswordEmpty);
        }
        let link = match parse_link(&raw.link) {
            Ok(url) => Some(url),
            Err(reason) => {
                problems.push(FieldError::LinkInvalid(reason));
                None
            }
        };

        match (raw.date, link) {
            (Some(date), Some(link)) if problems.is_empty() => Ok(IntakeRecord {
                date,
                stream: raw.stream.trim().to_string(),
                founder_name: raw.founder_name.trim().to_string(),
                venture_name: raw.venture_name.trim().to_string(),
                venture_manager_name: raw.venture_manager_name.trim().to_string(),
                link,
                password: raw.password.trim().to_string(),
                comments: normalize_comments(&raw.comments),
            }),
            _ => Err(ValidationError { problems }),
        }
    }
}

fn parse_link(raw: &str) -> Result<Url, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty".to_string());
    }
    let url = Url::parse(trimmed).map_err(|e| e.to_string())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(format!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(url)
}

fn normalize_comments(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}

/// Shared fixture for tests across the crate.
#[cfg(test)]
pub(crate) fn sample_raw() -> RawIntake {
    RawIntake {
        date: NaiveDate::from_ymd_opt(2024, 1, 15),
        stream: "AI".to_string(),
        founder_name: "Jane Doe".to_string(),
        venture_name: "Acme Robotics".to_string(),
        venture_manager_name: "Alex Manager".to_string(),
        link: "https://acme.example".to_string(),
        password: "x".to_string(),
        comments: String::new(),
    }
}
