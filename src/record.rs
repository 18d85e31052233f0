use chrono::{NaiveDate, NaiveDateTime};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DATE_IN_ID: Regex = Regex::new(r"(\d{4}-\d{1,2}-\d{1,2})").unwrap();
}

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// A single cell as read from the uploaded sheet, before any column semantics are applied
#[derive(Clone, Debug, PartialEq)]
pub enum RawValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
}

impl RawValue {
    /// Textual form of the cell. Integral numbers print without a fraction so
    /// that numeric user ids survive the round trip through a spreadsheet.
    pub fn to_text(&self) -> String {
        match self {
            RawValue::Empty => String::new(),
            RawValue::Text(s) => s.trim().to_string(),
            RawValue::Number(n) => format_number(*n),
            RawValue::Bool(b) => b.to_string(),
            RawValue::DateTime(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    pub fn to_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if n.is_finite() => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            RawValue::DateTime(dt) => Some(*dt),
            RawValue::Text(s) => parse_datetime_text(s.trim()),
            _ => None,
        }
    }

    pub fn to_date(&self) -> Option<NaiveDate> {
        self.to_datetime().map(|dt| dt.date())
    }

    /// Lower-cased yes/no flag. Anything that is not text (or a boolean) counts as "no".
    pub fn to_flag(&self) -> String {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => s.trim().to_lowercase(),
            RawValue::Bool(true) => "yes".to_string(),
            _ => "no".to_string(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            RawValue::Empty => true,
            RawValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// Pulls the first `YYYY-M-D` date out of an identifier such as `"2024-03-07_daily"`.
pub fn extract_report_date(id: &str) -> Option<NaiveDate> {
    let found = DATE_IN_ID.captures(id)?.get(1)?;
    NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d").ok()
}

fn parse_datetime_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

/// One user's activity for the report day, normalised from an uploaded row
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct UserRecord {
    /// Date embedded in the `id` column
    pub report_date: Option<NaiveDate>,
    pub user_id: String,
    pub login: String,
    pub status: String,
    pub registration_date: Option<NaiveDate>,
    pub last_login: Option<NaiveDateTime>,

    /// "yes"/"no" (lower-cased, missing treated as "no")
    pub logged_in_day: String,
    pub have_bet: String,

    pub total_deposit_amount: Option<f64>,
    pub total_withdrawal_amount: Option<f64>,
    pub total_release_bonus_amount: Option<f64>,
    pub total_bet_amount: Option<f64>,
    pub session_number: Option<f64>,
    pub session_time_minutes: Option<f64>,
}

impl UserRecord {
    pub fn logged_in(&self) -> bool {
        self.logged_in_day == "yes"
    }

    pub fn flagged_bet(&self) -> bool {
        self.have_bet == "yes"
    }

    pub fn deposited(&self) -> bool {
        matches!(self.total_deposit_amount, Some(v) if v > 0.0)
    }

    /// Deposit amount is known and not positive. A blank amount is neither
    /// a deposit nor a non-deposit.
    pub fn no_deposit(&self) -> bool {
        matches!(self.total_deposit_amount, Some(v) if v <= 0.0)
    }

    /// Withdrawals are exported as negative amounts
    pub fn withdrew(&self) -> bool {
        matches!(self.total_withdrawal_amount, Some(v) if v < 0.0)
    }

    pub fn received_bonus(&self) -> bool {
        matches!(self.total_release_bonus_amount, Some(v) if v > 0.0)
    }

    pub fn bet_by_amount(&self) -> bool {
        matches!(self.total_bet_amount, Some(v) if v > 0.0)
    }

    pub fn is_active(&self) -> bool {
        self.status.trim().eq_ignore_ascii_case("active")
    }

    pub fn is_new_on(&self, date: NaiveDate) -> bool {
        self.registration_date == Some(date)
    }

    pub fn logged_in_on(&self, date: NaiveDate) -> bool {
        self.last_login.map(|dt| dt.date()) == Some(date)
    }

    pub fn login_time(&self) -> String {
        self.last_login
            .map(|dt| dt.format("%H:%M:%S").to_string())
            .unwrap_or_default()
    }
}
