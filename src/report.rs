use crate::error::{ReportError, Result};
use crate::metrics::{Analysis, BetRule, DailyMetrics, analyze};
use crate::progress::{ProgressSink, Stage};
use crate::record::{UserRecord, format_number};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::str::FromStr;

pub const NO_SESSIONS_WARNING: &str = "No se registraron sesiones de usuario.";

/// A value in one of the exported detail tables
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TableValue {
    Number(f64),
    Text(String),
    Empty,
}

impl TableValue {
    fn text(s: &str) -> Self {
        TableValue::Text(s.to_string())
    }

    fn number(n: Option<f64>) -> Self {
        n.map(TableValue::Number).unwrap_or(TableValue::Empty)
    }

    pub fn display(&self) -> String {
        match self {
            TableValue::Number(n) => format_number(*n),
            TableValue::Text(s) => s.clone(),
            TableValue::Empty => String::new(),
        }
    }
}

/// The two detail tables a report can export
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TableKind {
    NewUsers,
    LoginNoBet,
}

impl TableKind {
    pub fn slug(self) -> &'static str {
        match self {
            TableKind::NewUsers => "new-users",
            TableKind::LoginNoBet => "login-no-bet",
        }
    }

    /// Download file name without extension
    pub fn file_stem(self) -> &'static str {
        match self {
            TableKind::NewUsers => "nuevos_usuarios",
            TableKind::LoginNoBet => "usuarios_login_no_jugaron",
        }
    }
}

impl FromStr for TableKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "new-users" => Ok(TableKind::NewUsers),
            "login-no-bet" => Ok(TableKind::LoginNoBet),
            other => Err(ReportError::UnknownTable(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Table {
    pub kind: TableKind,
    pub title: String,
    /// Shown instead of the table when it has no rows
    pub empty_message: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<TableValue>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricLine {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    pub lines: Vec<MetricLine>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Section {
            title: title.into(),
            lines: Vec::new(),
        }
    }

    fn line(mut self, label: &str, value: impl ToString) -> Self {
        self.lines.push(MetricLine {
            label: label.to_string(),
            value: value.to_string(),
        });
        self
    }
}

/// Everything shown for one processed upload
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DailyReport {
    pub source: String,
    pub report_date: NaiveDate,
    pub bet_rule: BetRule,
    pub metrics: DailyMetrics,
    pub sections: Vec<Section>,
    pub warnings: Vec<String>,
    pub new_users: Table,
    pub login_without_bet: Table,
}

/// Two decimals with a percent sign, e.g. `0.125` becomes `"12.50%"`
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Run the full pipeline over loaded rows and assemble the report
pub fn build_report(
    source: &str,
    records: &[UserRecord],
    rule: BetRule,
    progress: &mut dyn ProgressSink,
) -> Result<DailyReport> {
    let analysis = analyze(records, rule, progress)?;
    progress.update(Stage::Rendering);
    let report = DailyReport::from_analysis(source, &analysis);
    progress.update(Stage::Done);
    Ok(report)
}

impl DailyReport {
    pub fn from_analysis(source: &str, analysis: &Analysis) -> Self {
        let m = &analysis.metrics;
        let mut warnings = Vec::new();

        let general = Section::new("Métricas Generales")
            .line("Usuarios que iniciaron sesión", m.logged_in)
            .line("Usuarios que apostaron", m.bettors)
            .line("Usuarios que depositaron", m.depositors)
            .line("Usuarios que retiraron", m.withdrawers);

        let crosses = Section::new("Cruces entre acciones")
            .line("Iniciaron sesión pero no depositaron", m.login_without_deposit)
            .line("Iniciaron sesión pero no apostaron", m.login_without_bet)
            .line("Iniciaron sesión y apostaron", m.login_with_bet)
            .line("Depositantes que no jugaron", m.deposit_without_bet)
            .line("Depositantes que apostaron", m.deposit_with_bet)
            .line("Usuarios activos con alguna acción", m.active_with_action)
            .line("Recibieron bono y jugaron", m.bonus_with_bet)
            .line("Recibieron bono y no jugaron", m.bonus_without_bet);

        let mut shares = Section::new("Porcentajes sobre usuarios que iniciaron sesión");
        match &m.login_shares {
            Some(s) => {
                shares = shares
                    .line("% que apostaron", format_percent(s.bet))
                    .line("% que depositaron", format_percent(s.deposit))
                    .line("% que no apostaron", format_percent(s.no_bet))
                    .line("% que no depositaron", format_percent(s.no_deposit));
            }
            None => warnings.push(NO_SESSIONS_WARNING.to_string()),
        }

        let new_section = Section::new(format!(
            "Nuevos usuarios registrados el día del reporte: {}",
            m.report_date
        ))
        .line("Nuevos usuarios", m.new_users.total)
        .line("Nuevos que no jugaron", m.new_users.without_bet)
        .line("Nuevos que recibieron bono", m.new_users.with_bonus)
        .line("Nuevos que iniciaron sesión", m.new_users.logged_in)
        .line("Nuevos sin iniciar sesión", m.new_users.without_login);

        DailyReport {
            source: source.to_string(),
            report_date: m.report_date,
            bet_rule: analysis.bet_rule,
            metrics: m.clone(),
            sections: vec![general, crosses, shares, new_section],
            warnings,
            new_users: new_users_table(&analysis.new_users),
            login_without_bet: login_without_bet_table(&analysis.login_without_bet_today),
        }
    }

    pub fn table(&self, kind: TableKind) -> &Table {
        match kind {
            TableKind::NewUsers => &self.new_users,
            TableKind::LoginNoBet => &self.login_without_bet,
        }
    }

    /// Plain-text rendering used by the command line tool
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Reporte Diario de Actividad de Usuarios");
        let _ = writeln!(out, "Archivo: {}  Fecha: {}", self.source, self.report_date);

        for section in &self.sections {
            let _ = writeln!(out, "\n== {} ==", section.title);
            for line in &section.lines {
                let _ = writeln!(out, "{}: {}", line.label, line.value);
            }
        }

        for warning in &self.warnings {
            let _ = writeln!(out, "\n! {}", warning);
        }

        for table in [&self.new_users, &self.login_without_bet] {
            let _ = writeln!(out, "\n== {} ==", table.title);
            match (&table.empty_message, table.is_empty()) {
                (Some(message), true) => {
                    let _ = writeln!(out, "{}", message);
                }
                _ => {
                    let _ = writeln!(out, "{}", table.headers.join(" | "));
                    for row in &table.rows {
                        let cells: Vec<String> = row.iter().map(TableValue::display).collect();
                        let _ = writeln!(out, "{}", cells.join(" | "));
                    }
                }
            }
        }

        out
    }
}

fn new_users_table(users: &[UserRecord]) -> Table {
    Table {
        kind: TableKind::NewUsers,
        title: "Nuevos usuarios".to_string(),
        empty_message: Some(
            "No se encontraron usuarios nuevos en la fecha del reporte.".to_string(),
        ),
        headers: ["User ID", "Login", "¿Jugó?", "Monto Bono Recibido", "¿Inició sesión?"]
            .iter()
            .map(|h| h.to_string())
            .collect(),
        rows: users
            .iter()
            .map(|u| {
                vec![
                    TableValue::text(&u.user_id),
                    TableValue::text(&u.login),
                    TableValue::text(&u.have_bet),
                    TableValue::number(u.total_release_bonus_amount),
                    TableValue::text(&u.logged_in_day),
                ]
            })
            .collect(),
    }
}

fn login_without_bet_table(users: &[UserRecord]) -> Table {
    Table {
        kind: TableKind::LoginNoBet,
        title: "Usuarios que iniciaron sesión pero NO jugaron (solo si fue el día del reporte)"
            .to_string(),
        empty_message: None,
        headers: [
            "User ID",
            "Login",
            "Hora Login",
            "Cantidad de Sesiones",
            "Duración de Sesión (min)",
            "Monto Bono Recibido",
            "¿Inició sesión?",
            "¿Jugó?",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect(),
        rows: users
            .iter()
            .map(|u| {
                vec![
                    TableValue::text(&u.user_id),
                    TableValue::text(&u.login),
                    TableValue::Text(u.login_time()),
                    TableValue::number(u.session_number),
                    TableValue::number(u.session_time_minutes),
                    TableValue::number(u.total_release_bonus_amount),
                    TableValue::text(&u.logged_in_day),
                    TableValue::text(&u.have_bet),
                ]
            })
            .collect(),
    }
}
