//! Core types for data-source provisioning.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{Error, Result};

/// Table queried by the pool health check.
pub const HEALTH_CHECK_TABLE: &str = "SYS.SYSTABLES";

// =============================================================================
// Inputs
// =============================================================================

/// Everything needed to provision one data source, fixed before any mutation.
///
/// The password is held as a [`SecretString`]: it never shows up in `Debug`
/// output and is zeroized when the `ResourceSpec` is dropped.
#[derive(Debug)]
pub struct ResourceSpec {
    /// Name of the data-source resource (unique within the domain).
    pub name: String,
    /// JNDI name the data source is bound to.
    pub jndi_name: String,
    /// Fully qualified JDBC driver class.
    pub driver_class: String,
    /// JDBC connection URL.
    pub url: String,
    /// Server (or cluster) the data source is targeted to.
    pub target_name: String,
    /// Optional database user, stored as the `user` driver property.
    pub db_user: Option<String>,
    /// Optional database password, stored only in encrypted form.
    pub db_password: Option<SecretString>,
}

impl ResourceSpec {
    /// Create a spec without database credentials.
    pub fn new(
        name: impl Into<String>,
        jndi_name: impl Into<String>,
        driver_class: impl Into<String>,
        url: impl Into<String>,
        target_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            jndi_name: jndi_name.into(),
            driver_class: driver_class.into(),
            url: url.into(),
            target_name: target_name.into(),
            db_user: None,
            db_password: None,
        }
    }

    /// Set the database user.
    pub fn db_user(mut self, user: impl Into<String>) -> Self {
        self.db_user = Some(user.into());
        self
    }

    /// Set the database password.
    pub fn db_password(mut self, password: impl Into<String>) -> Self {
        self.db_password = Some(SecretString::from(password.into()));
        self
    }

    /// Driver settings derived from this spec.
    pub fn driver_settings(&self) -> DriverSettings {
        DriverSettings {
            driver_class: self.driver_class.clone(),
            url: self.url.clone(),
        }
    }
}

/// Login for the administrative session.
#[derive(Debug)]
pub struct Credentials {
    /// Administrator user name.
    pub user: String,
    /// Administrator password.
    pub password: SecretString,
}

impl Credentials {
    /// Create credentials from a user and a plaintext password.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: SecretString::from(password.into()),
        }
    }
}

/// Address of a domain's administration server.
///
/// Accepts `t3`, `t3s`, `http` and `https` URLs. `t3` and `t3s` are the
/// server's native protocols and map to `http` and `https` for the
/// management REST API, which is served on the same listen port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    raw: String,
    http: Url,
}

impl Endpoint {
    /// Parse an admin URL such as `t3://localhost:7001`.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = || Error::InvalidEndpoint(raw.to_string());
        let parsed = Url::parse(raw.trim()).map_err(|_| invalid())?;

        let scheme = match parsed.scheme() {
            "t3" | "http" => "http",
            "t3s" | "https" => "https",
            _ => return Err(invalid()),
        };
        let host = parsed.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
        let authority = match parsed.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let http = Url::parse(&format!("{scheme}://{authority}/")).map_err(|_| invalid())?;

        Ok(Self {
            raw: raw.trim().to_string(),
            http,
        })
    }

    /// The URL as given by the operator.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// HTTP(S) root of the administration server.
    pub fn http_root(&self) -> &Url {
        &self.http
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Edit transaction
// =============================================================================

/// Lifecycle of an edit transaction.
///
/// Moves forward through `NotStarted → Editing → Activating → Committed`, or
/// aborts from `Editing`/`Activating` into the absorbing `Cancelled` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No edit lock acquired yet.
    NotStarted,
    /// Edit lock held; mutations may be staged.
    Editing,
    /// Staged edits are being saved and activated.
    Activating,
    /// Edits are applied on the servers.
    Committed,
    /// Edits were discarded.
    Cancelled,
}

impl TxState {
    /// Whether the transaction still holds the edit lock.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Editing | Self::Activating)
    }
}

impl fmt::Display for TxState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Editing => "editing",
            Self::Activating => "activating",
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{name}")
    }
}

/// Step of the provisioning flow, used to tag failures inside an edit session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    /// Creating the resource and its nested parameters.
    CreateResource,
    /// Encrypting and attaching database credentials.
    Credentials,
    /// Binding the resource to its target.
    Target,
    /// Saving and activating the change set.
    Commit,
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::CreateResource => "creating the resource",
            Self::Credentials => "attaching credentials",
            Self::Target => "targeting the resource",
            Self::Commit => "committing",
        };
        write!(f, "{text}")
    }
}

// =============================================================================
// Handles into the configuration tree
// =============================================================================

/// Reference to a data-source resource in the configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    name: String,
}

impl ResourceHandle {
    /// Create a handle for the named resource.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reference to a server found in the live server registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerHandle {
    name: String,
}

impl ServerHandle {
    /// Create a handle for the named server.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Server name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Reference to one property in a resource's driver property set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyHandle {
    resource: String,
    name: String,
}

impl PropertyHandle {
    /// Create a handle for a driver property of `resource`.
    pub fn new(resource: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            name: name.into(),
        }
    }

    /// Owning resource name.
    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A credential ready to be attached to a data source.
///
/// Backends decide what it holds. A backend with a client-side encryption
/// primitive returns ciphertext; the REST backend has none and passes the
/// secret through for the server to encrypt when it is stored. Either way
/// callers can only hand it back to
/// [`ConfigurationClient::set_encrypted_password`](crate::backend::ConfigurationClient::set_encrypted_password).
pub struct EncryptedCredential(SecretString);

impl EncryptedCredential {
    /// Wrap a backend-produced value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(SecretString::from(value.into()))
    }

    /// The backend-specific value.
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for EncryptedCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptedCredential([REDACTED])")
    }
}

// =============================================================================
// Nested parameter objects
// =============================================================================

/// Driver class and connection URL of a data source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverSettings {
    /// Fully qualified JDBC driver class.
    pub driver_class: String,
    /// JDBC connection URL.
    pub url: String,
}

/// Connection pool parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    /// Test a connection before handing it out.
    pub test_connections_on_reserve: bool,
    /// Table queried by the connection test.
    pub test_table_name: String,
}

impl PoolSettings {
    /// The health-check settings every provisioned pool gets.
    pub fn health_check() -> Self {
        Self {
            test_connections_on_reserve: true,
            test_table_name: HEALTH_CHECK_TABLE.to_string(),
        }
    }
}

// =============================================================================
// Targeting and outcomes
// =============================================================================

/// How the target was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPath {
    /// Resolved in the server registry and bound within the edit session.
    Direct,
    /// Not found as a server; staged edits were saved and the target
    /// assigned by name.
    NameFallback,
}

impl fmt::Display for TargetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => write!(f, "direct"),
            Self::NameFallback => write!(f, "name-based fallback"),
        }
    }
}

/// Target of a binding, resolved against the server registry or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetRef {
    /// A live server.
    Resolved(ServerHandle),
    /// A name the registry did not know; assigned by name.
    Unresolved(String),
}

/// A resource bound to its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetBinding {
    /// Resource name.
    pub resource: String,
    /// Target the resource was bound to.
    pub target: TargetRef,
}

impl TargetBinding {
    /// Name of the target.
    pub fn target_name(&self) -> &str {
        match &self.target {
            TargetRef::Resolved(server) => server.name(),
            TargetRef::Unresolved(name) => name,
        }
    }

    /// Which targeting path produced this binding.
    pub fn path(&self) -> TargetPath {
        match self.target {
            TargetRef::Resolved(_) => TargetPath::Direct,
            TargetRef::Unresolved(_) => TargetPath::NameFallback,
        }
    }
}

/// Result of one provisioning run.
#[derive(Debug)]
pub enum ProvisionOutcome {
    /// The data source was created, targeted and activated.
    Created {
        /// Where it was bound.
        binding: TargetBinding,
    },
    /// A data source with that name already existed; nothing was changed.
    AlreadyExists {
        /// Resource name.
        name: String,
    },
    /// Provisioning failed; any staged edits were discarded.
    Failed {
        /// The original failure.
        error: Error,
    },
}

impl ProvisionOutcome {
    /// Whether the run left the domain in the desired state.
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }

    /// Whether the run changed the domain.
    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created { .. })
    }

    /// Convert into a `Result`, keeping successful outcomes.
    pub fn into_result(self) -> Result<Self> {
        match self {
            Self::Failed { error } => Err(error),
            other => Ok(other),
        }
    }
}
