//! Derivation of the daily activity segments and their cross-tabulations.
//!
//! Every count is a row count over the uploaded export. Segments are plain
//! predicates over [`UserRecord`]; the only configurable piece is how "bet"
//! is decided, see [`BetRule`].

use crate::error::{ReportError, Result};
use crate::progress::{ProgressSink, Stage};
use crate::record::UserRecord;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// How a user is classified as having bet on the report day
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BetRule {
    /// `have_bet` equals "yes"
    #[default]
    Flag,
    /// `total_bet_amount` is greater than zero
    Amount,
    /// The user id appears among the ids of rows flagged as having bet
    IdentifierDifference,
}

struct BetClassifier<'a> {
    rule: BetRule,
    bettor_ids: HashSet<&'a str>,
}

impl<'a> BetClassifier<'a> {
    fn new(rule: BetRule, records: &'a [UserRecord]) -> Self {
        let bettor_ids = match rule {
            BetRule::IdentifierDifference => records
                .iter()
                .filter(|r| r.flagged_bet())
                .map(|r| r.user_id.as_str())
                .collect(),
            _ => HashSet::new(),
        };
        BetClassifier { rule, bettor_ids }
    }

    fn bet(&self, record: &UserRecord) -> bool {
        match self.rule {
            BetRule::Flag => record.flagged_bet(),
            BetRule::Amount => record.bet_by_amount(),
            BetRule::IdentifierDifference => self.bettor_ids.contains(record.user_id.as_str()),
        }
    }
}

/// Shares of logged-in users, as fractions in `[0, 1]`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoginShares {
    pub bet: f64,
    pub deposit: f64,
    pub no_bet: f64,
    pub no_deposit: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUserMetrics {
    pub total: usize,
    pub without_bet: usize,
    pub with_bonus: usize,
    pub logged_in: usize,
    pub without_login: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub report_date: NaiveDate,
    pub total_users: usize,

    pub logged_in: usize,
    pub bettors: usize,
    pub depositors: usize,
    pub withdrawers: usize,

    pub login_without_deposit: usize,
    pub login_without_bet: usize,
    pub login_with_bet: usize,
    pub deposit_without_bet: usize,
    pub deposit_with_bet: usize,
    pub active_with_action: usize,
    pub bonus_with_bet: usize,
    pub bonus_without_bet: usize,
    pub logged_in_depositors: usize,

    /// `None` when nobody logged in
    pub login_shares: Option<LoginShares>,
    pub new_users: NewUserMetrics,
}

/// Metrics plus the row subsets shown as detail tables
#[derive(Clone, Debug)]
pub struct Analysis {
    pub metrics: DailyMetrics,
    pub bet_rule: BetRule,
    /// Users registered on the report date, in upload order
    pub new_users: Vec<UserRecord>,
    /// Logged in without betting, last login on the report date
    pub login_without_bet_today: Vec<UserRecord>,
}

fn count<F>(records: &[UserRecord], predicate: F) -> usize
where
    F: Fn(&UserRecord) -> bool,
{
    records.iter().filter(|r| predicate(r)).count()
}

fn share(part: usize, whole: usize) -> f64 {
    part as f64 / whole as f64
}

/// The report date is the `id` date of the first row
pub fn report_date(records: &[UserRecord]) -> Result<NaiveDate> {
    records
        .first()
        .and_then(|r| r.report_date)
        .ok_or(ReportError::MissingReportDate)
}

/// Run the whole derivation over the uploaded rows
pub fn analyze(
    records: &[UserRecord],
    rule: BetRule,
    progress: &mut dyn ProgressSink,
) -> Result<Analysis> {
    progress.update(Stage::Dates);
    if records.is_empty() {
        return Err(ReportError::EmptySheet);
    }
    let date = report_date(records)?;
    debug!("report date {} with bet rule {:?}", date, rule);

    progress.update(Stage::Metrics);
    let bets = BetClassifier::new(rule, records);
    let bet = |r: &UserRecord| bets.bet(r);

    let logged_in = count(records, |r| r.logged_in());
    let login_with_bet = count(records, |r| r.logged_in() && bet(r));
    let login_without_bet = count(records, |r| r.logged_in() && !bet(r));
    let login_without_deposit = count(records, |r| r.logged_in() && r.no_deposit());
    let logged_in_depositors = count(records, |r| r.logged_in() && r.deposited());

    let login_shares = (logged_in > 0).then(|| LoginShares {
        bet: share(login_with_bet, logged_in),
        deposit: share(logged_in_depositors, logged_in),
        no_bet: share(login_without_bet, logged_in),
        no_deposit: share(login_without_deposit, logged_in),
    });

    progress.update(Stage::NewUsers);
    let new_users: Vec<UserRecord> = records
        .iter()
        .filter(|r| r.is_new_on(date))
        .cloned()
        .collect();
    let new_user_metrics = NewUserMetrics {
        total: new_users.len(),
        without_bet: count(&new_users, |r| !bet(r)),
        with_bonus: count(&new_users, |r| r.received_bonus()),
        logged_in: count(&new_users, |r| r.logged_in()),
        without_login: count(&new_users, |r| !r.logged_in()),
    };

    let login_without_bet_today: Vec<UserRecord> = records
        .iter()
        .filter(|r| r.logged_in() && !bet(r) && r.logged_in_on(date))
        .cloned()
        .collect();

    let metrics = DailyMetrics {
        report_date: date,
        total_users: records.len(),
        logged_in,
        bettors: count(records, bet),
        depositors: count(records, |r| r.deposited()),
        withdrawers: count(records, |r| r.withdrew()),
        login_without_deposit,
        login_without_bet,
        login_with_bet,
        deposit_without_bet: count(records, |r| r.deposited() && !bet(r)),
        deposit_with_bet: count(records, |r| r.deposited() && bet(r)),
        active_with_action: count(records, |r| r.is_active() && (r.deposited() || bet(r))),
        bonus_with_bet: count(records, |r| r.received_bonus() && bet(r)),
        bonus_without_bet: count(records, |r| r.received_bonus() && !bet(r)),
        logged_in_depositors,
        login_shares,
        new_users: new_user_metrics,
    };

    Ok(Analysis {
        metrics,
        bet_rule: rule,
        new_users,
        login_without_bet_today,
    })
}
