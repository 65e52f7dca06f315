use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Sake, UserId};
use crate::error::FieldErrors;

/// A 1 to 5 star rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: i64) -> Option<Self> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Some(Self(value as u8))
        } else {
            None
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn stars(self) -> String {
        "★".repeat(self.0 as usize)
    }
}

impl TryFrom<i64> for Rating {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Rating::new(value).ok_or(value)
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stars())
    }
}

/// The user-editable part of a log.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogFields {
    pub is_liked: bool,
    pub is_drunk: bool,
    pub rating: Option<Rating>,
    pub memo: String,
    pub drunk_at: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SakeLog {
    pub id: i64,
    pub user_id: UserId,
    pub sake_id: i64,
    #[serde(flatten)]
    pub fields: LogFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A log together with the sake it is about, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedSake {
    #[serde(flatten)]
    pub log: SakeLog,
    pub sake: Sake,
}

/// Which of a user's logs to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFilter {
    Drunk,
    Liked,
}

impl LogFilter {
    pub(crate) fn column(self) -> &'static str {
        match self {
            LogFilter::Drunk => "is_drunk",
            LogFilter::Liked => "is_liked",
        }
    }
}

/// Raw log input as submitted by a form or the command line.
///
/// Absent fields are left untouched. An empty `rating` or `drunk_at` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogForm {
    pub is_drunk: Option<bool>,
    pub is_liked: Option<bool>,
    pub rating: Option<String>,
    pub drunk_at: Option<String>,
    pub memo: Option<String>,
}

/// Validated changes to apply to a log. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogPatch {
    pub is_drunk: Option<bool>,
    pub is_liked: Option<bool>,
    pub rating: Option<Option<Rating>>,
    pub drunk_at: Option<Option<NaiveDate>>,
    pub memo: Option<String>,
}

impl LogForm {
    pub fn validate(&self) -> Result<LogPatch, FieldErrors> {
        let mut errors = FieldErrors::new();

        let rating = match self.rating.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(None),
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) => match Rating::new(n) {
                    Some(r) => Some(Some(r)),
                    None => {
                        errors.add(
                            "rating",
                            format!("must be between {} and {}", Rating::MIN, Rating::MAX),
                        );
                        None
                    }
                },
                Err(_) => {
                    errors.add("rating", "must be a whole number");
                    None
                }
            },
        };

        let drunk_at = match self.drunk_at.as_deref().map(str::trim) {
            None => None,
            Some("") => Some(None),
            Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(Some(date)),
                Err(_) => {
                    errors.add("drunk_at", "must be a date in YYYY-MM-DD format");
                    None
                }
            },
        };

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(LogPatch {
            is_drunk: self.is_drunk,
            is_liked: self.is_liked,
            rating,
            drunk_at,
            memo: self.memo.clone(),
        })
    }
}

impl LogPatch {
    pub fn apply(&self, fields: &mut LogFields) {
        if let Some(is_drunk) = self.is_drunk {
            fields.is_drunk = is_drunk;
        }
        if let Some(is_liked) = self.is_liked {
            fields.is_liked = is_liked;
        }
        if let Some(rating) = self.rating {
            fields.rating = rating;
        }
        if let Some(drunk_at) = self.drunk_at {
            fields.drunk_at = drunk_at;
        }
        if let Some(memo) = &self.memo {
            fields.memo = memo.clone();
        }
    }
}
