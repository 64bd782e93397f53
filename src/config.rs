//! Daemon configuration
//!
//! Every setting is a long flag with an environment-variable fallback.
//! [`ConfigArgs`] holds the raw values; [`Config`] is the validated,
//! immutable form built once at startup.

use std::path::PathBuf;
use std::time::Duration;

use clap::builder::BoolishValueParser;
use clap::Args;

use crate::controller::RetryPolicy;
use crate::crd::{
    DEFAULT_MODE_PATH, DEFAULT_NO_WAIT_PATH, DEFAULT_STATUS_COMMENT_PATH, DEFAULT_STATUS_MODE_PATH,
    DEFAULT_STATUS_STATUS_PATH,
};
use crate::document::FieldPath;
use crate::error::{Error, Result};
use crate::health::{HealthGroups, ServiceGroups, WorkloadGroup, WorkloadKind};

/// Address of the tracked document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomResourceConfig {
    /// API group; empty for the core group
    pub group: String,
    pub version: String,
    /// Plural resource name, e.g. `configmaps`
    pub resource: String,
    pub name: String,
    pub namespace: String,
}

/// Where the status block lives inside the document
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusPaths {
    pub mode: FieldPath,
    pub status: FieldPath,
    /// Empty when comments are not persisted
    pub comment: FieldPath,
    /// Write status as ordinary fields instead of through the status sub-resource
    pub treat_status_as_field: bool,
}

impl StatusPaths {
    pub fn default_layout(treat_status_as_field: bool) -> Self {
        Self {
            mode: FieldPath::parse(DEFAULT_STATUS_MODE_PATH),
            status: FieldPath::parse(DEFAULT_STATUS_STATUS_PATH),
            comment: FieldPath::parse(DEFAULT_STATUS_COMMENT_PATH),
            treat_status_as_field,
        }
    }
}

/// Field locators for the desired mode, the no-wait flag and the status block
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisasterRecoveryPaths {
    pub mode: FieldPath,
    pub no_wait: FieldPath,
    /// No-wait is stored as `"true"`/`"false"` rather than a JSON bool
    pub no_wait_as_string: bool,
    pub status: StatusPaths,
}

impl DisasterRecoveryPaths {
    pub fn default_layout(treat_status_as_field: bool) -> Self {
        Self {
            mode: FieldPath::parse(DEFAULT_MODE_PATH),
            no_wait: FieldPath::parse(DEFAULT_NO_WAIT_PATH),
            no_wait_as_string: false,
            status: StatusPaths::default_layout(treat_status_as_field),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HealthConfig {
    pub groups: HealthGroups,
    /// External health endpoint queried as a custom health source
    pub endpoint: Option<String>,
    pub full_health_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthConfig {
    pub enabled: bool,
    pub service_account_name: String,
    pub namespace: String,
    pub custom_audience: Option<String>,
}

impl AuthConfig {
    /// Username a caller's token must resolve to
    pub fn expected_username(&self) -> String {
        format!(
            "system:serviceaccount:{}:{}",
            self.namespace, self.service_account_name
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub tls_enabled: bool,
    /// Directory holding `tls.crt`, `tls.key` and `ca.crt`
    pub certs_path: PathBuf,
}

impl ServerConfig {
    pub fn cert_file(&self) -> PathBuf {
        self.certs_path.join("tls.crt")
    }

    pub fn key_file(&self) -> PathBuf {
        self.certs_path.join("tls.key")
    }

    pub fn ca_file(&self) -> PathBuf {
        self.certs_path.join("ca.crt")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    pub retry: RetryPolicy,
    pub action_timeout: Option<Duration>,
}

/// Validated daemon configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub resource: CustomResourceConfig,
    pub paths: DisasterRecoveryPaths,
    pub health: HealthConfig,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub controller: ControllerConfig,
}

/// Raw configuration flags
#[derive(Args, Clone, Debug)]
pub struct ConfigArgs {
    /// Tracked document as "<group> <version> <resource> <name>"
    #[arg(long, env = "RESOURCE_FOR_DR")]
    pub resource_for_dr: Option<String>,

    /// Namespace of the tracked document and the checked workloads
    #[arg(long, env = "NAMESPACE")]
    pub namespace: Option<String>,

    /// Use the DisasterRecovery CRD field layout
    #[arg(long, env = "USE_DEFAULT_PATHS", value_parser = BoolishValueParser::new())]
    pub use_default_paths: bool,

    /// Write status as ordinary fields instead of the status sub-resource
    #[arg(long, env = "TREAT_STATUS_AS_FIELD", value_parser = BoolishValueParser::new())]
    pub treat_status_as_field: bool,

    #[arg(long, env = "DISASTER_RECOVERY_MODE_PATH")]
    pub mode_path: Option<String>,

    #[arg(long, env = "DISASTER_RECOVERY_NOWAIT_PATH")]
    pub no_wait_path: Option<String>,

    /// Store the no-wait flag as a string
    #[arg(long, env = "DISASTER_RECOVERY_NOWAIT_AS_STRING", value_parser = BoolishValueParser::new())]
    pub no_wait_as_string: bool,

    #[arg(long, env = "DISASTER_RECOVERY_STATUS_MODE_PATH")]
    pub status_mode_path: Option<String>,

    #[arg(long, env = "DISASTER_RECOVERY_STATUS_STATUS_PATH")]
    pub status_status_path: Option<String>,

    #[arg(long, env = "DISASTER_RECOVERY_STATUS_COMMENT_PATH")]
    pub status_comment_path: Option<String>,

    /// Workloads as "<kind> <name>,<kind> <name>,..."
    #[arg(long, env = "HEALTH_MAIN_SERVICES_ACTIVE")]
    pub health_main_services_active: Option<String>,

    #[arg(long, env = "HEALTH_ADDITIONAL_SERVICES_ACTIVE")]
    pub health_additional_services_active: Option<String>,

    #[arg(long, env = "HEALTH_MAIN_SERVICES_STANDBY")]
    pub health_main_services_standby: Option<String>,

    #[arg(long, env = "HEALTH_ADDITIONAL_SERVICES_STANDBY")]
    pub health_additional_services_standby: Option<String>,

    #[arg(long, env = "HEALTH_MAIN_SERVICES_DISABLED")]
    pub health_main_services_disabled: Option<String>,

    #[arg(long, env = "HEALTH_ADDITIONAL_SERVICES_DISABLED")]
    pub health_additional_services_disabled: Option<String>,

    /// External health endpoint
    #[arg(long, env = "ADDITIONAL_HEALTH_ENDPOINT")]
    pub additional_health_endpoint: Option<String>,

    /// Let the external health source decide the whole verdict
    #[arg(long, env = "EXTERNAL_FULL_HEALTH_ENABLED", value_parser = BoolishValueParser::new())]
    pub external_full_health_enabled: bool,

    #[arg(long, env = "SITE_MANAGER_SERVICE_ACCOUNT_NAME")]
    pub site_manager_service_account_name: Option<String>,

    #[arg(long, env = "SITE_MANAGER_NAMESPACE")]
    pub site_manager_namespace: Option<String>,

    #[arg(long, env = "SITE_MANAGER_CUSTOM_AUDIENCE")]
    pub site_manager_custom_audience: Option<String>,

    /// Serve HTTPS
    #[arg(long, env = "TLS_ENABLED", value_parser = BoolishValueParser::new())]
    pub tls_enabled: bool,

    /// Listen port (defaults to 8080, or 8443 with TLS)
    #[arg(long, env = "SERVER_PORT")]
    pub server_port: Option<u16>,

    #[arg(long, env = "CERTS_PATH", default_value = "/tls/")]
    pub certs_path: String,

    /// DR action attempts per switchover
    #[arg(long, env = "CONTROLLER_RETRY_ATTEMPTS", default_value_t = 1)]
    pub retry_attempts: u32,

    /// Delay between DR action attempts
    #[arg(long, env = "CONTROLLER_RETRY_DELAY_SECS", default_value_t = 5)]
    pub retry_delay_secs: u64,

    /// Upper bound for a single DR action attempt
    #[arg(long, env = "DR_ACTION_TIMEOUT_SECS")]
    pub action_timeout_secs: Option<u64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn required<'a>(value: &'a Option<String>, key: &str) -> Result<&'a str> {
    non_empty(value).ok_or_else(|| {
        Error::ConfigError(format!("the environment variable '{key}' must not be empty"))
    })
}

/// Parse `"<group> <version> <resource> <name>"`; quotes are stripped and an
/// empty group (`""`) selects the core API group
pub fn parse_resource(raw: &str, namespace: &str) -> Result<CustomResourceConfig> {
    let cleaned = raw.replace(['\'', '"'], "");
    let words: Vec<&str> = cleaned.trim_end().split(' ').collect();
    let &[group, version, resource, name] = words.as_slice() else {
        return Err(Error::ConfigError(
            "RESOURCE_FOR_DR environment variable must contain exactly four variables which are separated by a single space"
                .to_string(),
        ));
    };
    if version.is_empty() || resource.is_empty() || name.is_empty() {
        return Err(Error::ConfigError(
            "RESOURCE_FOR_DR must name a version, a resource and an object".to_string(),
        ));
    }
    Ok(CustomResourceConfig {
        group: group.to_string(),
        version: version.to_string(),
        resource: resource.to_string(),
        name: name.to_string(),
        namespace: namespace.to_string(),
    })
}

/// Parse `"<kind> <name>,<kind> <name>,..."`
pub fn parse_workload_group(key: &str, raw: &str) -> Result<WorkloadGroup> {
    let mut group = WorkloadGroup::new();
    for pair in raw.split(',') {
        let parts: Vec<&str> = pair.trim().split(' ').collect();
        let &[kind, name] = parts.as_slice() else {
            return Err(Error::ConfigError(format!(
                "{key} environment variable must contain word pairs separated by commas and each pair contains exactly two words separated by a single space"
            )));
        };
        let kind: WorkloadKind = kind.parse().map_err(|_| {
            Error::ConfigError(format!(
                "environment variable {key} must be in the list - [deployment statefulset]"
            ))
        })?;
        group.insert(kind, name);
    }
    Ok(group)
}

fn optional_group(value: &Option<String>, key: &str) -> Result<Option<WorkloadGroup>> {
    non_empty(value)
        .map(|raw| parse_workload_group(key, raw))
        .transpose()
}

impl ConfigArgs {
    fn paths(&self) -> Result<DisasterRecoveryPaths> {
        if self.use_default_paths {
            return Ok(DisasterRecoveryPaths::default_layout(self.treat_status_as_field));
        }
        Ok(DisasterRecoveryPaths {
            mode: FieldPath::parse(required(&self.mode_path, "DISASTER_RECOVERY_MODE_PATH")?),
            no_wait: FieldPath::parse(required(&self.no_wait_path, "DISASTER_RECOVERY_NOWAIT_PATH")?),
            no_wait_as_string: self.no_wait_as_string,
            status: StatusPaths {
                mode: FieldPath::parse(required(
                    &self.status_mode_path,
                    "DISASTER_RECOVERY_STATUS_MODE_PATH",
                )?),
                status: FieldPath::parse(required(
                    &self.status_status_path,
                    "DISASTER_RECOVERY_STATUS_STATUS_PATH",
                )?),
                comment: non_empty(&self.status_comment_path)
                    .map(FieldPath::parse)
                    .unwrap_or_default(),
                treat_status_as_field: self.treat_status_as_field,
            },
        })
    }

    fn health(&self) -> Result<HealthConfig> {
        let active_main = parse_workload_group(
            "HEALTH_MAIN_SERVICES_ACTIVE",
            required(&self.health_main_services_active, "HEALTH_MAIN_SERVICES_ACTIVE")?,
        )?;
        let groups = HealthGroups {
            active: ServiceGroups {
                main: Some(active_main),
                additional: optional_group(
                    &self.health_additional_services_active,
                    "HEALTH_ADDITIONAL_SERVICES_ACTIVE",
                )?,
            },
            standby: ServiceGroups {
                main: optional_group(&self.health_main_services_standby, "HEALTH_MAIN_SERVICES_STANDBY")?,
                additional: optional_group(
                    &self.health_additional_services_standby,
                    "HEALTH_ADDITIONAL_SERVICES_STANDBY",
                )?,
            },
            disabled: ServiceGroups {
                main: optional_group(&self.health_main_services_disabled, "HEALTH_MAIN_SERVICES_DISABLED")?,
                additional: optional_group(
                    &self.health_additional_services_disabled,
                    "HEALTH_ADDITIONAL_SERVICES_DISABLED",
                )?,
            },
        };
        Ok(HealthConfig {
            groups,
            endpoint: non_empty(&self.additional_health_endpoint).map(str::to_string),
            full_health_enabled: self.external_full_health_enabled,
        })
    }

    fn auth(&self) -> Result<AuthConfig> {
        let account = non_empty(&self.site_manager_service_account_name);
        let namespace = non_empty(&self.site_manager_namespace);
        let (enabled, account, namespace) = match (account, namespace) {
            (Some(a), Some(n)) => (true, a, n),
            (None, None) => (false, "", ""),
            _ => {
                return Err(Error::ConfigError(
                    "both SITE_MANAGER_SERVICE_ACCOUNT_NAME and SITE_MANAGER_NAMESPACE must be set"
                        .to_string(),
                ))
            }
        };
        Ok(AuthConfig {
            enabled,
            service_account_name: account.to_string(),
            namespace: namespace.to_string(),
            custom_audience: non_empty(&self.site_manager_custom_audience).map(str::to_string),
        })
    }

    fn server(&self) -> ServerConfig {
        let default_port = if self.tls_enabled { 8443 } else { 8080 };
        let trimmed = self.certs_path.trim().trim_end_matches('/');
        ServerConfig {
            port: self.server_port.unwrap_or(default_port),
            tls_enabled: self.tls_enabled,
            certs_path: PathBuf::from(if trimmed.is_empty() { "/" } else { trimmed }),
        }
    }

    fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            retry: RetryPolicy::new(self.retry_attempts, Duration::from_secs(self.retry_delay_secs)),
            action_timeout: self
                .action_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

impl TryFrom<ConfigArgs> for Config {
    type Error = Error;

    fn try_from(args: ConfigArgs) -> Result<Self> {
        let raw_resource = required(&args.resource_for_dr, "RESOURCE_FOR_DR")?;
        let namespace = required(&args.namespace, "NAMESPACE")?;
        Ok(Config {
            resource: parse_resource(raw_resource, namespace)?,
            paths: args.paths()?,
            health: args.health()?,
            auth: args.auth()?,
            server: args.server(),
            controller: args.controller(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn base_args() -> ConfigArgs {
        ConfigArgs {
            resource_for_dr: some("\"\" v1 configmaps dr-config"),
            namespace: some("postgres"),
            use_default_paths: false,
            treat_status_as_field: true,
            mode_path: some("data.mode"),
            no_wait_path: some("data.noWait"),
            no_wait_as_string: true,
            status_mode_path: some("data.status_mode"),
            status_status_path: some("data.status_status"),
            status_comment_path: some("data.status_comment"),
            health_main_services_active: some("deployment api,statefulset db"),
            health_additional_services_active: None,
            health_main_services_standby: None,
            health_additional_services_standby: None,
            health_main_services_disabled: None,
            health_additional_services_disabled: None,
            additional_health_endpoint: None,
            external_full_health_enabled: false,
            site_manager_service_account_name: None,
            site_manager_namespace: None,
            site_manager_custom_audience: None,
            tls_enabled: false,
            server_port: None,
            certs_path: "/tls/".to_string(),
            retry_attempts: 1,
            retry_delay_secs: 5,
            action_timeout_secs: None,
        }
    }

    #[test]
    fn test_valid_custom_paths() {
        let config = Config::try_from(base_args()).unwrap();
        assert_eq!(
            config.resource,
            CustomResourceConfig {
                group: String::new(),
                version: "v1".to_string(),
                resource: "configmaps".to_string(),
                name: "dr-config".to_string(),
                namespace: "postgres".to_string(),
            }
        );
        assert_eq!(config.paths.mode.to_string(), "data.mode");
        assert!(config.paths.no_wait_as_string);
        assert!(config.paths.status.treat_status_as_field);
        assert_eq!(config.paths.status.comment.to_string(), "data.status_comment");
        assert!(!config.auth.enabled);
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.certs_path, PathBuf::from("/tls"));
        assert_eq!(config.controller.retry, RetryPolicy::default());
        assert_eq!(config.controller.action_timeout, None);

        let active = config.health.groups.active.main.unwrap();
        assert_eq!(
            active.iter().collect::<Vec<_>>(),
            vec![(WorkloadKind::Deployment, "api"), (WorkloadKind::StatefulSet, "db")]
        );
        assert!(config.health.groups.standby.main.is_none());
    }

    #[test]
    fn test_default_layout_ignores_custom_paths() {
        let args = ConfigArgs {
            use_default_paths: true,
            mode_path: None,
            status_mode_path: None,
            ..base_args()
        };
        let config = Config::try_from(args).unwrap();
        assert_eq!(config.paths, DisasterRecoveryPaths::default_layout(true));
        assert_eq!(
            config.paths.status.comment.to_string(),
            "status.disasterRecoveryStatus.comment"
        );
    }

    #[test]
    fn test_missing_required_values() {
        let err = Config::try_from(ConfigArgs {
            namespace: some("  "),
            ..base_args()
        })
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: the environment variable 'NAMESPACE' must not be empty"
        );

        let err = Config::try_from(ConfigArgs {
            status_status_path: None,
            ..base_args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("DISASTER_RECOVERY_STATUS_STATUS_PATH"));

        let err = Config::try_from(ConfigArgs {
            health_main_services_active: None,
            ..base_args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("HEALTH_MAIN_SERVICES_ACTIVE"));
    }

    #[test]
    fn test_optional_comment_path() {
        let config = Config::try_from(ConfigArgs {
            status_comment_path: None,
            ..base_args()
        })
        .unwrap();
        assert!(config.paths.status.comment.is_empty());
    }

    #[test]
    fn test_resource_parsing() {
        let parsed = parse_resource("'qubership.org' v1 postgresservices pg", "ns").unwrap();
        assert_eq!(parsed.group, "qubership.org");
        assert_eq!(parsed.resource, "postgresservices");

        assert!(parse_resource("v1 configmaps dr", "ns").is_err());
        assert!(parse_resource("a b c d e", "ns").is_err());
        assert!(parse_resource("a  c d", "ns").is_err());
    }

    #[test]
    fn test_workload_group_parsing() {
        let group = parse_workload_group("K", "Deployment api,STATEFULSET db").unwrap();
        assert_eq!(group.iter().count(), 2);

        let err = parse_workload_group("K", "deployment").unwrap_err();
        assert!(err.to_string().contains("word pairs"));
        let err = parse_workload_group("K", "daemonset agent").unwrap_err();
        assert!(err.to_string().contains("must be in the list"));
    }

    #[test]
    fn test_auth_requires_both_values() {
        let err = Config::try_from(ConfigArgs {
            site_manager_service_account_name: some("site-manager"),
            ..base_args()
        })
        .unwrap_err();
        assert!(err.to_string().contains("must be set"));

        let config = Config::try_from(ConfigArgs {
            site_manager_service_account_name: some("site-manager"),
            site_manager_namespace: some("site-manager"),
            site_manager_custom_audience: some("sm-services"),
            ..base_args()
        })
        .unwrap();
        assert!(config.auth.enabled);
        assert_eq!(
            config.auth.expected_username(),
            "system:serviceaccount:site-manager:site-manager"
        );
        assert_eq!(config.auth.custom_audience.as_deref(), Some("sm-services"));
    }

    #[test]
    fn test_tls_default_port_and_retry_settings() {
        let config = Config::try_from(ConfigArgs {
            tls_enabled: true,
            certs_path: "/etc/certs/".to_string(),
            retry_attempts: 3,
            retry_delay_secs: 1,
            action_timeout_secs: Some(30),
            ..base_args()
        })
        .unwrap();
        assert_eq!(config.server.port, 8443);
        assert_eq!(config.server.cert_file(), PathBuf::from("/etc/certs/tls.crt"));
        assert_eq!(config.controller.retry.attempts, 3);
        assert_eq!(config.controller.retry.delay, Duration::from_secs(1));
        assert_eq!(config.controller.action_timeout, Some(Duration::from_secs(30)));

        let config = Config::try_from(ConfigArgs {
            tls_enabled: true,
            server_port: Some(9443),
            ..base_args()
        })
        .unwrap();
        assert_eq!(config.server.port, 9443);
    }

    #[derive(Parser, Debug)]
    struct TestCli {
        #[command(flatten)]
        args: ConfigArgs,
    }

    #[test]
    fn test_flags_parse() {
        let cli = TestCli::try_parse_from([
            "drd",
            "--resource-for-dr",
            "disaster-recovery.io v1 disasterrecoveries site",
            "--namespace",
            "dr",
            "--use-default-paths",
            "--health-main-services-active",
            "deployment api",
            "--retry-attempts",
            "2",
        ])
        .unwrap();
        assert!(cli.args.use_default_paths);
        assert_eq!(cli.args.retry_attempts, 2);
        assert_eq!(cli.args.certs_path, "/tls/");

        let config = Config::try_from(cli.args).unwrap();
        assert_eq!(config.resource.group, "disaster-recovery.io");
        assert_eq!(config.resource.name, "site");
    }

    #[test]
    fn test_bool_env_values_accept_common_spellings() {
        let vars = [
            ("TLS_ENABLED", "True"),
            ("USE_DEFAULT_PATHS", "1"),
            ("TREAT_STATUS_AS_FIELD", "t"),
            ("DISASTER_RECOVERY_NOWAIT_AS_STRING", "TRUE"),
            ("EXTERNAL_FULL_HEALTH_ENABLED", "0"),
        ];
        for (key, value) in vars {
            std::env::set_var(key, value);
        }
        let parsed = TestCli::try_parse_from(["drd"]);
        for (key, _) in vars {
            std::env::remove_var(key);
        }

        let args = parsed.unwrap().args;
        assert!(args.tls_enabled);
        assert!(args.use_default_paths);
        assert!(args.treat_status_as_field);
        assert!(args.no_wait_as_string);
        assert!(!args.external_full_health_enabled);
    }

    #[test]
    fn test_bool_flag_without_value_is_true() {
        let cli = TestCli::try_parse_from(["drd", "--tls-enabled"]).unwrap();
        assert!(cli.args.tls_enabled);
    }
}
