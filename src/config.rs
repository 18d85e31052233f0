use crate::metrics::BetRule;
use clap::Parser;

/// Settings for the report server, read from the command line or the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "report-server", version, about = "Daily user activity report server")]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "REPORT_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "REPORT_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Largest accepted upload, in megabytes
    #[arg(long, env = "REPORT_MAX_UPLOAD_MB", default_value_t = 20)]
    pub max_upload_mb: usize,

    /// Processed reports kept in memory; the oldest is dropped first
    #[arg(long, env = "REPORT_MAX_REPORTS", default_value_t = 32)]
    pub max_reports: usize,

    /// Default rule deciding whether a user bet
    #[arg(long, env = "REPORT_BET_RULE", value_enum, default_value_t = BetRule::Flag)]
    pub bet_rule: BetRule,
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_upload_mb: 20,
            max_reports: 32,
            bet_rule: BetRule::Flag,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let config = ServerConfig::try_parse_from([
            "report-server",
            "--port",
            "8080",
            "--bet-rule",
            "identifier-difference",
        ])
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bet_rule, BetRule::IdentifierDifference);
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn upload_limit_in_bytes() {
        let config = ServerConfig {
            max_upload_mb: 2,
            ..Default::default()
        };
        assert_eq!(config.max_upload_bytes(), 2 * 1024 * 1024);
    }

    #[test]
    fn huge_upload_limit_saturates() {
        let config = ServerConfig {
            max_upload_mb: usize::MAX,
            ..Default::default()
        };
        assert_eq!(config.max_upload_bytes(), usize::MAX);
    }
}
