use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Default evaluation cadence in seconds. The engine ticks at this rate and
/// trigger hit-windows are this wide, so with the default every due instant
/// is matched to the second.
pub const DEFAULT_LOOP_INTERVAL_SECS: u64 = 1;

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    /// Seconds between engine ticks. Override: CADENCE_LOOP_INTERVAL=5
    #[serde(default = "default_loop_interval")]
    pub loop_interval: u64,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            loop_interval: default_loop_interval(),
            schedule: ScheduleConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Identifier attached to fired-job log records.
    #[serde(default = "default_agent_id")]
    pub id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: default_agent_id(),
        }
    }
}

/// The `[schedule]` table: schedule-wide defaults plus the job map.
///
/// `enabled` and `splay` sit at the same nesting level as the job names, so
/// any other key under `[schedule]` is a job definition. That matches the
/// external `{"schedule": {job_name: {...}}}` shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Schedule-wide enable flag. A job with an explicit per-job `enabled`
    /// keeps its own value regardless of this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Schedule-wide splay default, overridable per job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splay: Option<Splay>,
    #[serde(flatten)]
    pub jobs: BTreeMap<String, JobSpec>,
}

/// One schedule entry, as written by the user.
///
/// Exactly one trigger family should be set: `when`, `cron`, `once`, or the
/// interval fields. Timestamps stay strings here and are parsed at
/// evaluation time, so a bad date surfaces from the evaluator rather than at
/// config load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSpec {
    /// Identifier of the callable to invoke when due. Opaque to the
    /// scheduler; handed to the dispatcher as-is.
    pub function: String,

    /// One absolute timestamp, or an ordered list of them. Each listed time
    /// fires once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<WhenSpec>,

    /// 5-field cron expression (minute hour day month weekday).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cron: Option<String>,

    /// Absolute timestamp; the job fires exactly one time, ever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub once: Option<String>,
    /// strftime format for `once` (default `%Y-%m-%dT%H:%M:%S`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub once_fmt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<u64>,

    /// Jitter added once to each computed fire instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub splay: Option<Splay>,

    /// Past this instant the job is permanently skipped (`until_passed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
    /// Before this instant the job is skipped (`after_not_passed`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    /// Per-job enable override; absent means "inherit the schedule-wide
    /// flag, defaulting to true".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Fire on the first evaluation after the job appears in the table.
    #[serde(default, skip_serializing_if = "is_false")]
    pub run_on_start: bool,

    /// Passed through to the dispatcher untouched.
    #[serde(default, skip_serializing_if = "is_false")]
    pub dry_run: bool,
}

impl JobSpec {
    /// Minimal spec with only `function` set; trigger fields are filled in
    /// by the caller.
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            when: None,
            cron: None,
            once: None,
            once_fmt: None,
            seconds: None,
            minutes: None,
            hours: None,
            days: None,
            splay: None,
            until: None,
            after: None,
            enabled: None,
            run_on_start: false,
            dry_run: false,
        }
    }
}

/// `when` accepts a single timestamp or an ordered list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhenSpec {
    One(String),
    Many(Vec<String>),
}

impl WhenSpec {
    pub fn entries(&self) -> &[String] {
        match self {
            WhenSpec::One(s) => std::slice::from_ref(s),
            WhenSpec::Many(v) => v,
        }
    }
}

/// Splay: `splay = 300` draws uniformly from [0, 300]; a table draws from
/// [start, end].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Splay {
    Secs(u64),
    Range { start: u64, end: u64 },
}

fn is_false(v: &bool) -> bool {
    !v
}

fn default_loop_interval() -> u64 {
    DEFAULT_LOOP_INTERVAL_SECS
}

fn default_agent_id() -> String {
    "cadence".to_string()
}

impl CadenceConfig {
    /// Load config from a TOML file with CADENCE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cadence/cadence.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: CadenceConfig = Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("CADENCE_").split("__"))
            .extract()
            .map_err(|e| crate::error::CadenceError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_table_flattens_job_names() {
        let toml = r#"
            loop_interval = 5

            [schedule]
            enabled = false

            [schedule.ping]
            function = "test.ping"
            seconds = 30
            enabled = true

            [schedule.report]
            function = "status.report"
            cron = "0 4 * * *"
        "#;
        let config: CadenceConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.loop_interval, 5);
        assert_eq!(config.schedule.enabled, Some(false));
        assert_eq!(config.schedule.jobs.len(), 2);

        let ping = &config.schedule.jobs["ping"];
        assert_eq!(ping.function, "test.ping");
        assert_eq!(ping.seconds, Some(30));
        assert_eq!(ping.enabled, Some(true));

        let report = &config.schedule.jobs["report"];
        assert_eq!(report.cron.as_deref(), Some("0 4 * * *"));
        assert_eq!(report.enabled, None);
    }

    #[test]
    fn splay_accepts_int_or_range() {
        let spec: JobSpec = toml::from_str(
            r#"
            function = "test.ping"
            when = "2017-11-29T16:00:00"
            splay = 300
        "#,
        )
        .unwrap();
        assert!(matches!(spec.splay, Some(Splay::Secs(300))));

        let spec: JobSpec = toml::from_str(
            r#"
            function = "test.ping"
            when = "2017-11-29T16:00:00"
            splay = { start = 10, end = 30 }
        "#,
        )
        .unwrap();
        assert!(matches!(
            spec.splay,
            Some(Splay::Range { start: 10, end: 30 })
        ));
    }

    #[test]
    fn when_accepts_single_or_list() {
        let spec: JobSpec = toml::from_str(
            r#"
            function = "test.ping"
            when = ["2017-11-29T16:00:00", "2017-11-29T17:00:00"]
        "#,
        )
        .unwrap();
        assert_eq!(spec.when.unwrap().entries().len(), 2);
    }

    #[test]
    fn load_surfaces_malformed_toml_as_config_error() {
        let path = std::env::temp_dir().join("cadence-bad-config.toml");
        std::fs::write(&path, "loop_interval = \"not a number\"").unwrap();
        let err = CadenceConfig::load(path.to_str()).unwrap_err();
        assert!(matches!(err, crate::error::CadenceError::Config(_)));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn defaults_without_file() {
        let config = CadenceConfig::default();
        assert_eq!(config.loop_interval, DEFAULT_LOOP_INTERVAL_SECS);
        assert!(config.schedule.jobs.is_empty());
        assert_eq!(config.schedule.enabled, None);
    }
}
