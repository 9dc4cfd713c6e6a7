use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::eventual::PollBudget;

/// Location of the monitoring stack and the polling parameters the
/// scenarios use against it.
///
/// Defaults match a kubeprod-style installation: Prometheus and
/// Alertmanager running in the `kubeprod` namespace, Alertmanager served
/// under a `/alertmanager` path prefix, and a crash-loop alerting rule
/// named `CrashLooping_test` owned by the cluster's alerting config.
/// Every field can be overridden through a `MONITORING_*` environment
/// variable.
#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Namespace hosting the monitoring services.
    pub namespace: String,
    pub prometheus_service: String,
    pub prometheus_port: u16,
    pub alertmanager_service: String,
    pub alertmanager_port: u16,
    /// URL path prefix the alert-routing service is served under.
    pub alertmanager_path: String,
    /// Name of the crash-loop alert defined by the cluster's alerting rules.
    pub crashloop_alertname: String,
    /// Delay between poll attempts.
    pub poll_interval: Duration,
    /// Hard ceiling on how long a scenario waits for its condition.
    pub poll_timeout: Duration,
}

/// A service reachable through the API server's service proxy.
#[derive(Debug, Clone)]
pub struct ServiceRef {
    pub scheme: String,
    pub name: String,
    pub port: u16,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}: {message}")]
    InvalidValue {
        key: &'static str,
        value: String,
        message: String,
    },
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            namespace: "kubeprod".to_string(),
            prometheus_service: "prometheus".to_string(),
            prometheus_port: 9090,
            alertmanager_service: "alertmanager".to_string(),
            alertmanager_port: 9093,
            alertmanager_path: "/alertmanager".to_string(),
            crashloop_alertname: "CrashLooping_test".to_string(),
            poll_interval: Duration::from_secs(5),
            poll_timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl MonitoringConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_interval_secs = parse_or(
            vars,
            "MONITORING_POLL_INTERVAL_SECS",
            defaults.poll_interval.as_secs(),
        )?;
        let poll_timeout_secs = parse_or(
            vars,
            "MONITORING_POLL_TIMEOUT_SECS",
            defaults.poll_timeout.as_secs(),
        )?;

        Ok(Self {
            namespace: string_or(vars, "MONITORING_NAMESPACE", defaults.namespace),
            prometheus_service: string_or(
                vars,
                "MONITORING_PROMETHEUS_SERVICE",
                defaults.prometheus_service,
            ),
            prometheus_port: parse_or(
                vars,
                "MONITORING_PROMETHEUS_PORT",
                defaults.prometheus_port,
            )?,
            alertmanager_service: string_or(
                vars,
                "MONITORING_ALERTMANAGER_SERVICE",
                defaults.alertmanager_service,
            ),
            alertmanager_port: parse_or(
                vars,
                "MONITORING_ALERTMANAGER_PORT",
                defaults.alertmanager_port,
            )?,
            alertmanager_path: string_or(
                vars,
                "MONITORING_ALERTMANAGER_PATH",
                defaults.alertmanager_path,
            ),
            crashloop_alertname: string_or(
                vars,
                "MONITORING_CRASHLOOP_ALERTNAME",
                defaults.crashloop_alertname,
            ),
            poll_interval: Duration::from_secs(poll_interval_secs),
            poll_timeout: Duration::from_secs(poll_timeout_secs),
        })
    }

    /// Proxy target for the metrics service.
    pub fn prometheus(&self) -> ServiceRef {
        ServiceRef {
            scheme: "http".to_string(),
            name: self.prometheus_service.clone(),
            port: self.prometheus_port,
        }
    }

    /// Proxy target for the alert-routing service.
    pub fn alertmanager(&self) -> ServiceRef {
        ServiceRef {
            scheme: "http".to_string(),
            name: self.alertmanager_service.clone(),
            port: self.alertmanager_port,
        }
    }

    /// Poll budget the scenarios run with.
    pub fn poll_budget(&self) -> PollBudget {
        PollBudget::new(self.poll_interval, self.poll_timeout)
    }
}

fn string_or(vars: &HashMap<String, String>, key: &'static str, default: String) -> String {
    vars.get(key).cloned().unwrap_or(default)
}

fn parse_or<T>(
    vars: &HashMap<String, String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match vars.get(key) {
        Some(raw) => raw.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
            message: err.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_vars_defaults() {
        let config =
            MonitoringConfig::from_vars(&HashMap::new()).expect("Config should load successfully");

        assert_eq!(config.namespace, "kubeprod");
        assert_eq!(config.prometheus_service, "prometheus");
        assert_eq!(config.prometheus_port, 9090);
        assert_eq!(config.alertmanager_service, "alertmanager");
        assert_eq!(config.alertmanager_port, 9093);
        assert_eq!(config.alertmanager_path, "/alertmanager");
        assert_eq!(config.crashloop_alertname, "CrashLooping_test");
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.poll_timeout, Duration::from_secs(1200));
    }

    #[test]
    fn test_from_vars_overrides() {
        let vars = HashMap::from([
            ("MONITORING_NAMESPACE".to_string(), "mon".to_string()),
            (
                "MONITORING_PROMETHEUS_SERVICE".to_string(),
                "prom".to_string(),
            ),
            ("MONITORING_PROMETHEUS_PORT".to_string(), "9999".to_string()),
            (
                "MONITORING_ALERTMANAGER_SERVICE".to_string(),
                "am".to_string(),
            ),
            (
                "MONITORING_ALERTMANAGER_PORT".to_string(),
                "8080".to_string(),
            ),
            ("MONITORING_ALERTMANAGER_PATH".to_string(), "/am".to_string()),
            (
                "MONITORING_CRASHLOOP_ALERTNAME".to_string(),
                "PodRestarting".to_string(),
            ),
            ("MONITORING_POLL_INTERVAL_SECS".to_string(), "1".to_string()),
            ("MONITORING_POLL_TIMEOUT_SECS".to_string(), "60".to_string()),
        ]);

        let config = MonitoringConfig::from_vars(&vars).expect("Config should load successfully");

        assert_eq!(config.namespace, "mon");
        assert_eq!(config.prometheus_service, "prom");
        assert_eq!(config.prometheus_port, 9999);
        assert_eq!(config.alertmanager_service, "am");
        assert_eq!(config.alertmanager_port, 8080);
        assert_eq!(config.alertmanager_path, "/am");
        assert_eq!(config.crashloop_alertname, "PodRestarting");
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.poll_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_from_vars_invalid_port() {
        let vars = HashMap::from([(
            "MONITORING_PROMETHEUS_PORT".to_string(),
            "not-a-port".to_string(),
        )]);

        let result = MonitoringConfig::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, value, .. })
                if key == "MONITORING_PROMETHEUS_PORT" && value == "not-a-port"
        ));
    }

    #[test]
    fn test_from_vars_invalid_timeout() {
        let vars = HashMap::from([(
            "MONITORING_POLL_TIMEOUT_SECS".to_string(),
            "-5".to_string(),
        )]);

        let result = MonitoringConfig::from_vars(&vars);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, .. }) if key == "MONITORING_POLL_TIMEOUT_SECS"
        ));
    }

    #[test]
    fn test_service_refs() {
        let config = MonitoringConfig::default();

        let prometheus = config.prometheus();
        assert_eq!(prometheus.scheme, "http");
        assert_eq!(prometheus.name, "prometheus");
        assert_eq!(prometheus.port, 9090);

        let alertmanager = config.alertmanager();
        assert_eq!(alertmanager.scheme, "http");
        assert_eq!(alertmanager.name, "alertmanager");
        assert_eq!(alertmanager.port, 9093);
    }

    #[test]
    fn test_poll_budget_matches_config() {
        let config = MonitoringConfig::default();
        let budget = config.poll_budget();

        assert_eq!(budget.interval, config.poll_interval);
        assert_eq!(budget.timeout, config.poll_timeout);
    }
}
