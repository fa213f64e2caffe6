use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Days, NaiveDate};

use crate::error::{AppError, Result};

pub const DEFAULT_SOURCE_URL: &str = "https://www.bet9ja.com/Sport/Football/England/Premier-League";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";
pub const SHEETS_API_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Telegram rejects messages longer than this (in characters).
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Absolute changes this close to the threshold still count as reaching it.
pub const THRESHOLD_TOLERANCE_PCT: f64 = 1e-9;

pub const DEFAULT_THRESHOLD_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Csv,
    Json,
    Sqlite,
    GSheet,
}

impl FromStr for SinkKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(SinkKind::Csv),
            "json" => Ok(SinkKind::Json),
            "sqlite" | "db" => Ok(SinkKind::Sqlite),
            "gsheet" | "sheets" => Ok(SinkKind::GSheet),
            other => Err(AppError::Config(format!("unknown sink '{other}'"))),
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SinkKind::Csv => "csv",
            SinkKind::Json => "json",
            SinkKind::Sqlite => "sqlite",
            SinkKind::GSheet => "gsheet",
        };
        write!(f, "{s}")
    }
}

/// What to do when a snapshot for the same date is written twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    Reject,
    Replace,
}

impl FromStr for SnapshotPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "reject" => Ok(SnapshotPolicy::Reject),
            "replace" => Ok(SnapshotPolicy::Replace),
            other => Err(AppError::Config(format!(
                "SNAPSHOT_POLICY must be 'reject' or 'replace', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertFormat {
    Text,
    Html,
}

impl FromStr for AlertFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" | "plain" => Ok(AlertFormat::Text),
            "html" => Ok(AlertFormat::Html),
            other => Err(AppError::Config(format!(
                "ALERT_FORMAT must be 'text' or 'html', got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// League pages to scrape (SOURCE_URLS, comma-separated).
    pub source_urls: Vec<String>,
    pub timeout_secs: u64,
    /// Attempts per page, including the first.
    pub max_retries: u32,
    /// Pause between attempts and between pages.
    pub retry_delay_ms: u64,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct GSheetConfig {
    pub spreadsheet_id: String,
    /// OAuth bearer token with the spreadsheets scope.
    pub access_token: String,
    pub sheet_name: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub receiver: String,
    pub smtp_host: String,
    pub smtp_port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Directory for the per-date CSV and JSON files (DATA_DIR).
    pub data_dir: PathBuf,
    pub api_port: u16,
    pub fetch: FetchConfig,
    pub sinks: Vec<SinkKind>,
    pub snapshot_policy: SnapshotPolicy,
    pub gsheet: Option<GSheetConfig>,
    pub threshold_pct: f64,
    /// Explicit comparison window; unset means yesterday vs today.
    pub baseline_date: Option<NaiveDate>,
    pub current_date: Option<NaiveDate>,
    /// Overrides each channel's preferred rendering (ALERT_FORMAT).
    pub alert_format: Option<AlertFormat>,
    pub alert_on_missing_snapshot: bool,
    pub telegram: Option<TelegramConfig>,
    pub email: Option<EmailConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let source_urls = match get("SOURCE_URLS") {
            Some(raw) => split_list(&raw),
            None => vec![DEFAULT_SOURCE_URL.to_string()],
        };
        if source_urls.is_empty() {
            return Err(AppError::Config("SOURCE_URLS must name at least one page".to_string()));
        }

        let fetch = FetchConfig {
            source_urls,
            timeout_secs: parse_or(get("FETCH_TIMEOUT_SECS"), "FETCH_TIMEOUT_SECS", 15)?,
            max_retries: parse_or::<u32>(get("FETCH_MAX_RETRIES"), "FETCH_MAX_RETRIES", 3)?.max(1),
            retry_delay_ms: parse_or(get("FETCH_RETRY_DELAY_MS"), "FETCH_RETRY_DELAY_MS", 2000)?,
            user_agent: get("USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        let sinks = match get("SINKS") {
            Some(raw) => split_list(&raw)
                .iter()
                .map(|s| s.parse::<SinkKind>())
                .collect::<Result<Vec<_>>>()?,
            None => vec![SinkKind::Csv, SinkKind::Json, SinkKind::Sqlite, SinkKind::GSheet],
        };

        let snapshot_policy = get("SNAPSHOT_POLICY")
            .map(|s| s.parse::<SnapshotPolicy>())
            .transpose()?
            .unwrap_or(SnapshotPolicy::Reject);
        // Only the relational store can tell a rerun apart; the sheet only appends.
        if snapshot_policy == SnapshotPolicy::Reject
            && sinks.contains(&SinkKind::GSheet)
            && !sinks.contains(&SinkKind::Sqlite)
        {
            return Err(AppError::Config(
                "SINKS with gsheet needs sqlite when SNAPSHOT_POLICY=reject".to_string(),
            ));
        }

        let threshold_pct: f64 = parse_or(get("THRESHOLD_PERCENT"), "THRESHOLD_PERCENT", DEFAULT_THRESHOLD_PCT)?;
        if !threshold_pct.is_finite() || threshold_pct < 0.0 {
            return Err(AppError::Config(
                "THRESHOLD_PERCENT must be a non-negative number".to_string(),
            ));
        }

        let gsheet = match (get("GSHEET_SPREADSHEET_ID"), get("GSHEET_ACCESS_TOKEN")) {
            (Some(spreadsheet_id), Some(access_token)) => Some(GSheetConfig {
                spreadsheet_id,
                access_token,
                sheet_name: get("GSHEET_SHEET_NAME").unwrap_or_else(|| "Odds".to_string()),
                api_url: get("GSHEET_API_URL").unwrap_or_else(|| SHEETS_API_URL.to_string()),
            }),
            _ => None,
        };

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_url: get("TELEGRAM_API_URL").unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            }),
            _ => None,
        };

        let email = match (get("EMAIL_SENDER"), get("EMAIL_PASSWORD"), get("EMAIL_RECEIVER")) {
            (Some(sender), Some(password), Some(receiver)) => Some(EmailConfig {
                sender,
                password,
                receiver,
                smtp_host: get("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                smtp_port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587)?,
            }),
            _ => None,
        };

        Ok(Self {
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            db_path: get("DB_PATH").unwrap_or_else(|| "odds.db".to_string()),
            data_dir: PathBuf::from(get("DATA_DIR").unwrap_or_else(|| "data".to_string())),
            api_port: get("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            fetch,
            sinks,
            snapshot_policy,
            gsheet,
            threshold_pct,
            baseline_date: parse_date(get("BASELINE_DATE"), "BASELINE_DATE")?,
            current_date: parse_date(get("CURRENT_DATE"), "CURRENT_DATE")?,
            alert_format: get("ALERT_FORMAT").map(|s| s.parse::<AlertFormat>()).transpose()?,
            alert_on_missing_snapshot: get("ALERT_ON_MISSING_SNAPSHOT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            telegram,
            email,
        })
    }

    /// (baseline, current) dates to compare. Defaults to yesterday vs `today`.
    pub fn comparison_window(&self, today: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
        let current = self.current_date.unwrap_or(today);
        let baseline = match self.baseline_date {
            Some(d) => d,
            None => current
                .checked_sub_days(Days::new(1))
                .ok_or_else(|| AppError::Config(format!("no day before {current}")))?,
        };
        if baseline >= current {
            return Err(AppError::Config(format!(
                "BASELINE_DATE ({baseline}) must be before CURRENT_DATE ({current})"
            )));
        }
        Ok((baseline, current))
    }

    pub fn sink_enabled(&self, kind: SinkKind) -> bool {
        self.sinks.contains(&kind)
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: '{v}'"))),
        None => Ok(default),
    }
}

fn parse_date(value: Option<String>, key: &str) -> Result<Option<NaiveDate>> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .map_err(|_| AppError::Config(format!("{key} must be YYYY-MM-DD, got '{v}'")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| vars.get(k).cloned())
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let cfg = config_from(&[]).unwrap();
        assert_eq!(cfg.fetch.source_urls, vec![DEFAULT_SOURCE_URL.to_string()]);
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert_eq!(cfg.fetch.max_retries, 3);
        assert_eq!(cfg.threshold_pct, 10.0);
        assert_eq!(cfg.snapshot_policy, SnapshotPolicy::Reject);
        assert_eq!(cfg.sinks.len(), 4);
        assert!(cfg.telegram.is_none());
        assert!(cfg.email.is_none());
        assert!(cfg.gsheet.is_none());
        assert!(!cfg.alert_on_missing_snapshot);
    }

    #[test]
    fn parses_lists_and_channels() {
        let cfg = config_from(&[
            ("SOURCE_URLS", "https://a.example/x, https://b.example/y,"),
            ("SINKS", "csv,sqlite"),
            ("THRESHOLD_PERCENT", "12.5"),
            ("SNAPSHOT_POLICY", "replace"),
            ("TELEGRAM_BOT_TOKEN", "token"),
            ("TELEGRAM_CHAT_ID", "42"),
            ("EMAIL_SENDER", "a@example.com"),
            ("EMAIL_PASSWORD", "secret"),
            ("EMAIL_RECEIVER", "b@example.com"),
            ("SMTP_PORT", "2525"),
        ])
        .unwrap();
        assert_eq!(cfg.fetch.source_urls.len(), 2);
        assert_eq!(cfg.sinks, vec![SinkKind::Csv, SinkKind::Sqlite]);
        assert!(cfg.sink_enabled(SinkKind::Sqlite));
        assert!(!cfg.sink_enabled(SinkKind::GSheet));
        assert_eq!(cfg.threshold_pct, 12.5);
        assert_eq!(cfg.snapshot_policy, SnapshotPolicy::Replace);
        assert_eq!(cfg.telegram.unwrap().chat_id, "42");
        assert_eq!(cfg.email.unwrap().smtp_port, 2525);
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(config_from(&[("THRESHOLD_PERCENT", "ten")]).is_err());
        assert!(config_from(&[("THRESHOLD_PERCENT", "-1")]).is_err());
        assert!(config_from(&[("SINKS", "csv,ftp")]).is_err());
        assert!(config_from(&[("BASELINE_DATE", "01/03/2025")]).is_err());
        assert!(config_from(&[("API_PORT", "99999")]).is_err());
    }

    #[test]
    fn reject_policy_requires_sqlite_beside_the_sheet() {
        assert!(matches!(
            config_from(&[("SINKS", "csv,gsheet")]),
            Err(AppError::Config(_))
        ));
        assert!(config_from(&[("SINKS", "csv,gsheet"), ("SNAPSHOT_POLICY", "replace")]).is_ok());
        assert!(config_from(&[("SINKS", "gsheet,sqlite")]).is_ok());
    }

    #[test]
    fn comparison_window_defaults_to_yesterday() {
        let cfg = config_from(&[]).unwrap();
        let (baseline, current) = cfg.comparison_window(day("2025-03-01")).unwrap();
        assert_eq!(baseline, day("2025-02-28"));
        assert_eq!(current, day("2025-03-01"));
    }

    #[test]
    fn comparison_window_honours_explicit_dates() {
        let cfg = config_from(&[("BASELINE_DATE", "2025-01-01"), ("CURRENT_DATE", "2025-01-08")]).unwrap();
        let (baseline, current) = cfg.comparison_window(day("2025-03-01")).unwrap();
        assert_eq!(baseline, day("2025-01-01"));
        assert_eq!(current, day("2025-01-08"));

        let backwards = config_from(&[("BASELINE_DATE", "2025-01-08"), ("CURRENT_DATE", "2025-01-01")]).unwrap();
        assert!(backwards.comparison_window(day("2025-03-01")).is_err());
    }
}
