use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Database Models ============

/// A prospective-customer inquiry captured from the public form.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Lead {
    /// Assigned by the store on insert.
    pub id: Uuid,
    pub name: String,
    pub company: String,
    /// Free-text "what are you launching".
    pub launching: String,
    pub budget: String,
    pub timeline: String,
    /// Website or socials, as typed by the submitter.
    pub link: String,
    /// Client-supplied timestamp, or the ingestion time.
    pub submitted: String,
    #[sqlx(try_from = "String")]
    pub status: LeadStatus,
    /// Assigned by the store; default ordering key.
    pub created_at: DateTime<Utc>,
}

/// Lifecycle stage of a lead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeadStatus {
    #[default]
    New,
    Contacted,
    Proposal,
    Won,
    Lost,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 5] = [
        LeadStatus::New,
        LeadStatus::Contacted,
        LeadStatus::Proposal,
        LeadStatus::Won,
        LeadStatus::Lost,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Proposal => "proposal",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the five lead statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError(pub String);

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid lead status '{}', expected one of: new, contacted, proposal, won, lost",
            self.0
        )
    }
}

impl std::error::Error for ParseStatusError {}

impl FromStr for LeadStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LeadStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}

impl TryFrom<String> for LeadStatus {
    type Error = ParseStatusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============ Ingestion ============

/// A lead ready to be inserted. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewLead {
    pub name: String,
    pub company: String,
    pub launching: String,
    pub budget: String,
    pub timeline: String,
    pub link: String,
    pub submitted: String,
    pub status: LeadStatus,
}

impl NewLead {
    /// Coerces an untrusted JSON object into the stored shape.
    ///
    /// Only string values are taken; anything else (missing, null, numbers,
    /// nested objects) becomes the empty string. `submitted` falls back to
    /// `now`. Any `status` the caller sent is ignored.
    pub fn from_submission(body: &serde_json::Map<String, Value>, now: DateTime<Utc>) -> Self {
        let field = |key: &str| {
            body.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let submitted = match field("submitted") {
            s if s.is_empty() => now.to_rfc3339_opts(SecondsFormat::Millis, true),
            s => s,
        };

        Self {
            name: field("name"),
            company: field("company"),
            launching: field("launching"),
            budget: field("budget"),
            timeline: field("timeline"),
            link: field("link"),
            submitted,
            status: LeadStatus::New,
        }
    }

    /// Content fields that identify a repeated submission of the same form.
    pub fn content_fields(&self) -> [&str; 6] {
        [
            &self.name,
            &self.company,
            &self.launching,
            &self.budget,
            &self.timeline,
            &self.link,
        ]
    }
}

// ============ Query Models ============

/// Client-side status filter for the leads table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(LeadStatus),
}

impl StatusFilter {
    pub fn matches(&self, lead: &Lead) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => lead.status == *status,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Only(status) => status.as_str(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" | "all" => Ok(StatusFilter::All),
            other => other.parse().map(StatusFilter::Only),
        }
    }
}

/// Query string accepted by the list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LeadListParams {
    pub status: Option<String>,
}

impl LeadListParams {
    pub fn filter(&self) -> Result<StatusFilter, ParseStatusError> {
        self.status.as_deref().unwrap_or("all").parse()
    }
}

/// Body of `PATCH /api/internal/leads/:id`.
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

/// Dashboard counters derived from the full lead list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadStats {
    pub total: usize,
    pub new: usize,
    pub contacted: usize,
    pub proposal: usize,
    pub won: usize,
    pub lost: usize,
    /// Leads created within the trailing seven days.
    #[serde(rename = "thisWeek")]
    pub this_week: usize,
}

impl LeadStats {
    pub fn from_leads(leads: &[Lead], now: DateTime<Utc>) -> Self {
        let week_ago = now - Duration::days(7);
        let mut stats = LeadStats {
            total: leads.len(),
            ..Default::default()
        };

        for lead in leads {
            match lead.status {
                LeadStatus::New => stats.new += 1,
                LeadStatus::Contacted => stats.contacted += 1,
                LeadStatus::Proposal => stats.proposal += 1,
                LeadStatus::Won => stats.won += 1,
                LeadStatus::Lost => stats.lost += 1,
            }
            if lead.created_at >= week_ago {
                stats.this_week += 1;
            }
        }

        stats
    }

    pub fn count(&self, status: LeadStatus) -> usize {
        match status {
            LeadStatus::New => self.new,
            LeadStatus::Contacted => self.contacted,
            LeadStatus::Proposal => self.proposal,
            LeadStatus::Won => self.won,
            LeadStatus::Lost => self.lost,
        }
    }
}
