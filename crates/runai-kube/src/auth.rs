//! Cluster credential resolution
//!
//! Tries a fixed sequence of authentication strategies and keeps the first
//! one that yields a usable client configuration:
//!
//! 1. In-cluster service account (running inside the target cluster)
//! 2. Kubeconfig file (explicit path, `KUBECONFIG`, or `~/.kube/config`)
//! 3. Service account token file plus `KUBERNETES_SERVICE_HOST`/`PORT`
//! 4. `KUBERNETES_SERVICE_HOST`/`PORT` with an optional `KUBERNETES_TOKEN`
//!
//! Strategy failures are only logged at debug level; the caller sees an
//! error only when every strategy failed.

use crate::error::{AuthError, StrategyError};
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Conventional service account mount
pub const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

pub const ENV_SERVICE_HOST: &str = "KUBERNETES_SERVICE_HOST";
pub const ENV_SERVICE_PORT: &str = "KUBERNETES_SERVICE_PORT";
pub const ENV_TOKEN: &str = "KUBERNETES_TOKEN";
pub const ENV_CA_CERT_FILE: &str = "KUBERNETES_CA_CERT_FILE";
pub const ENV_KUBECONFIG: &str = "KUBECONFIG";

/// Which strategy produced the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    InCluster,
    Kubeconfig,
    ServiceAccountToken,
    Environment,
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthMethod::InCluster => write!(f, "in-cluster"),
            AuthMethod::Kubeconfig => write!(f, "kubeconfig file"),
            AuthMethod::ServiceAccountToken => write!(f, "service account token"),
            AuthMethod::Environment => write!(f, "environment variable"),
        }
    }
}

/// Inputs the strategies read, captured once so they can be substituted in tests
#[derive(Debug, Clone)]
pub struct CredentialSources {
    /// Explicit kubeconfig path; takes precedence over `KUBECONFIG`
    pub kubeconfig: Option<PathBuf>,
    pub token_file: PathBuf,
    pub ca_file: PathBuf,
    pub home: Option<PathBuf>,
    env: HashMap<String, String>,
}

impl CredentialSources {
    /// Snapshot of the current process environment
    pub fn from_env() -> Self {
        Self::with_env(std::env::vars())
    }

    pub fn with_env(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        let sa_dir = Path::new(SERVICE_ACCOUNT_DIR);
        Self {
            kubeconfig: None,
            token_file: sa_dir.join("token"),
            ca_file: sa_dir.join("ca.crt"),
            home: dirs_next::home_dir(),
            env: vars.into_iter().collect(),
        }
    }

    pub fn with_kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.kubeconfig = path;
        self
    }

    pub fn with_service_account_dir(mut self, dir: &Path) -> Self {
        self.token_file = dir.join("token");
        self.ca_file = dir.join("ca.crt");
        self
    }

    pub fn with_home(mut self, home: Option<PathBuf>) -> Self {
        self.home = home;
        self
    }

    /// Non-empty environment value
    pub fn var(&self, key: &str) -> Option<&str> {
        self.env
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Kubeconfig files to load, most specific source first
    pub fn kubeconfig_paths(&self) -> Vec<PathBuf> {
        if let Some(path) = &self.kubeconfig {
            return vec![path.clone()];
        }
        if let Some(list) = self.var(ENV_KUBECONFIG) {
            return std::env::split_paths(list)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
        }
        self.home
            .iter()
            .map(|home| home.join(".kube").join("config"))
            .collect()
    }

    fn service_endpoint(&self) -> Result<String, StrategyError> {
        match (self.var(ENV_SERVICE_HOST), self.var(ENV_SERVICE_PORT)) {
            (Some(host), Some(port)) => Ok(format!("https://{}:{}", host, port)),
            _ => Err(StrategyError(format!(
                "{} or {} environment variables not set",
                ENV_SERVICE_HOST, ENV_SERVICE_PORT
            ))),
        }
    }
}

/// A client configuration plus where it came from
#[derive(Debug, Clone)]
pub struct Credentials {
    pub method: AuthMethod,
    pub config: Config,
    /// Kubeconfig current-context, when one was used
    pub context: Option<String>,
}

/// One way of obtaining credentials
#[async_trait]
pub trait CredentialStrategy: Send + Sync {
    fn method(&self) -> AuthMethod;

    async fn load(&self) -> Result<Credentials, StrategyError>;
}

/// Mounted service identity, via `kube::Config::incluster`
pub struct InClusterStrategy;

#[async_trait]
impl CredentialStrategy for InClusterStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::InCluster
    }

    async fn load(&self) -> Result<Credentials, StrategyError> {
        let config = Config::incluster().map_err(|e| StrategyError(e.to_string()))?;
        Ok(Credentials {
            method: self.method(),
            config,
            context: None,
        })
    }
}

/// User kubeconfig file(s); several paths are merged in order
pub struct KubeconfigStrategy {
    paths: Vec<PathBuf>,
}

impl KubeconfigStrategy {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }
}

#[async_trait]
impl CredentialStrategy for KubeconfigStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::Kubeconfig
    }

    async fn load(&self) -> Result<Credentials, StrategyError> {
        let mut merged: Option<Kubeconfig> = None;

        for path in self.paths.iter().filter(|p| p.exists()) {
            let next = Kubeconfig::read_from(path)
                .map_err(|e| StrategyError(format!("{}: {}", path.display(), e)))?;
            merged = Some(match merged {
                Some(current) => current
                    .merge(next)
                    .map_err(|e| StrategyError(e.to_string()))?,
                None => next,
            });
        }

        let kubeconfig =
            merged.ok_or_else(|| StrategyError("no kubeconfig file found".to_string()))?;
        let context = kubeconfig.current_context.clone();
        let config = Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
            .await
            .map_err(|e| StrategyError(e.to_string()))?;

        Ok(Credentials {
            method: self.method(),
            config,
            context,
        })
    }
}

/// Token file at the conventional mount path, endpoint from the environment
pub struct ServiceAccountTokenStrategy {
    sources: CredentialSources,
}

impl ServiceAccountTokenStrategy {
    pub fn new(sources: CredentialSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl CredentialStrategy for ServiceAccountTokenStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::ServiceAccountToken
    }

    async fn load(&self) -> Result<Credentials, StrategyError> {
        let token_file = &self.sources.token_file;
        if !token_file.exists() {
            return Err(StrategyError("service account token file not found".to_string()));
        }
        let token = std::fs::read_to_string(token_file).map_err(|e| {
            StrategyError(format!("failed to read service account token: {}", e))
        })?;
        let server = self.sources.service_endpoint()?;

        let ca_file = self.sources.ca_file.exists().then(|| self.sources.ca_file.clone());
        let config = synthetic_config(&server, Some(token.trim()), ca_file.as_deref()).await?;

        Ok(Credentials {
            method: self.method(),
            config,
            context: None,
        })
    }
}

/// Endpoint, token and CA taken entirely from environment variables
pub struct EnvironmentStrategy {
    sources: CredentialSources,
}

impl EnvironmentStrategy {
    pub fn new(sources: CredentialSources) -> Self {
        Self { sources }
    }
}

#[async_trait]
impl CredentialStrategy for EnvironmentStrategy {
    fn method(&self) -> AuthMethod {
        AuthMethod::Environment
    }

    async fn load(&self) -> Result<Credentials, StrategyError> {
        let server = self.sources.service_endpoint()?;
        let token = self.sources.var(ENV_TOKEN);
        let ca_file = self.sources.var(ENV_CA_CERT_FILE).map(PathBuf::from);
        let config = synthetic_config(&server, token, ca_file.as_deref()).await?;

        Ok(Credentials {
            method: self.method(),
            config,
            context: None,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct SyntheticKubeconfig {
    #[serde(rename = "apiVersion")]
    api_version: &'static str,
    kind: &'static str,
    clusters: Vec<Named<ClusterEntry>>,
    users: Vec<Named<UserEntry>>,
    contexts: Vec<Named<ContextEntry>>,
    current_context: &'static str,
}

#[derive(Serialize)]
struct Named<T> {
    name: &'static str,
    #[serde(flatten)]
    entry: T,
}

#[derive(Serialize)]
struct ClusterEntry {
    cluster: ClusterFields,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct ClusterFields {
    server: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate_authority: Option<String>,
    insecure_skip_tls_verify: bool,
}

#[derive(Serialize)]
struct UserEntry {
    user: UserFields,
}

#[derive(Serialize)]
struct UserFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<String>,
}

#[derive(Serialize)]
struct ContextEntry {
    context: ContextFields,
}

#[derive(Serialize)]
struct ContextFields {
    cluster: &'static str,
    user: &'static str,
}

/// Build a client config from loose parts by going through an in-memory kubeconfig.
/// Without a CA file TLS verification is disabled.
async fn synthetic_config(
    server: &str,
    token: Option<&str>,
    ca_file: Option<&Path>,
) -> Result<Config, StrategyError> {
    const NAME: &str = "nmcrun";

    let doc = SyntheticKubeconfig {
        api_version: "v1",
        kind: "Config",
        clusters: vec![Named {
            name: NAME,
            entry: ClusterEntry {
                cluster: ClusterFields {
                    server: server.to_string(),
                    certificate_authority: ca_file.map(|p| p.display().to_string()),
                    insecure_skip_tls_verify: ca_file.is_none(),
                },
            },
        }],
        users: vec![Named {
            name: NAME,
            entry: UserEntry {
                user: UserFields {
                    token: token.map(|t| t.to_string()),
                },
            },
        }],
        contexts: vec![Named {
            name: NAME,
            entry: ContextEntry {
                context: ContextFields {
                    cluster: NAME,
                    user: NAME,
                },
            },
        }],
        current_context: NAME,
    };

    let value = serde_yaml::to_value(&doc).map_err(|e| StrategyError(e.to_string()))?;
    let kubeconfig: Kubeconfig =
        serde_yaml::from_value(value).map_err(|e| StrategyError(e.to_string()))?;

    Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
        .await
        .map_err(|e| StrategyError(e.to_string()))
}

/// An authenticated handle for one collection run
#[derive(Clone)]
pub struct ClusterSession {
    pub client: Client,
    pub method: AuthMethod,
    pub endpoint: String,
    pub context: Option<String>,
}

/// Ordered list of strategies; first success wins
pub struct CredentialResolver {
    strategies: Vec<Box<dyn CredentialStrategy>>,
    explicit_kubeconfig: Option<PathBuf>,
}

impl CredentialResolver {
    pub fn new(strategies: Vec<Box<dyn CredentialStrategy>>) -> Self {
        Self {
            strategies,
            explicit_kubeconfig: None,
        }
    }

    /// The four standard strategies in their fixed order
    ///
    /// In-cluster credentials are tried before any kubeconfig, including one
    /// passed explicitly.
    pub fn standard(sources: &CredentialSources) -> Self {
        Self::new(vec![
            Box::new(InClusterStrategy),
            Box::new(KubeconfigStrategy::new(sources.kubeconfig_paths())),
            Box::new(ServiceAccountTokenStrategy::new(sources.clone())),
            Box::new(EnvironmentStrategy::new(sources.clone())),
        ])
        .with_explicit_kubeconfig(sources.kubeconfig.clone())
    }

    /// Remember a user-supplied kubeconfig so it can be reported if unused
    pub fn with_explicit_kubeconfig(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_kubeconfig = path;
        self
    }

    /// The explicit kubeconfig that `method` took precedence over, if any
    pub fn shadowed_kubeconfig(&self, method: AuthMethod) -> Option<&Path> {
        match method {
            AuthMethod::Kubeconfig => None,
            _ => self.explicit_kubeconfig.as_deref(),
        }
    }

    /// Find the first strategy that yields a configuration
    pub async fn resolve_credentials(&self) -> Result<Credentials, AuthError> {
        for strategy in &self.strategies {
            match strategy.load().await {
                Ok(credentials) => {
                    tracing::info!("Using {} authentication", strategy.method());
                    if let Some(path) = self.shadowed_kubeconfig(credentials.method) {
                        tracing::info!(
                            "Ignoring kubeconfig {}: {} authentication takes precedence",
                            path.display(),
                            credentials.method
                        );
                    }
                    return Ok(credentials);
                }
                Err(e) => {
                    tracing::debug!("{} authentication not available: {}", strategy.method(), e);
                }
            }
        }
        Err(AuthError::NoMethod)
    }

    /// Resolve credentials and build the client
    pub async fn resolve(&self) -> Result<ClusterSession, AuthError> {
        let credentials = self.resolve_credentials().await?;
        let endpoint = credentials.config.cluster_url.to_string();
        let client = Client::try_from(credentials.config)
            .map_err(|e| AuthError::ClientCreate(e.to_string()))?;

        Ok(ClusterSession {
            client,
            method: credentials.method,
            endpoint,
            context: credentials.context,
        })
    }
}
