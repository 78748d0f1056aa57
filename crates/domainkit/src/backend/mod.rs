//! Backend abstraction for a domain's configuration tree.
//!
//! The [`ConfigurationClient`] trait is the typed surface of the remote
//! configuration store: one method per entity kind instead of walking a
//! loosely typed object tree. A [`Connector`] opens one client per
//! administrative session.
//!
//! Edit-tree methods assume the caller holds the edit lock; the only caller
//! that does is [`EditTransaction`](crate::transaction::EditTransaction).

mod mock;
#[cfg(feature = "rest")]
pub mod rest;

pub use mock::{Call, DataSourceRecord, MockClient, MockDomain};

use secrecy::SecretString;

use crate::error::Result;
use crate::types::{
    Credentials, DriverSettings, EncryptedCredential, Endpoint, PoolSettings, PropertyHandle,
    ResourceHandle, ServerHandle,
};

/// Opens administrative sessions.
pub trait Connector {
    /// Connect and authenticate against `endpoint`.
    ///
    /// Fails with [`Error::Connection`](crate::Error::Connection) when the
    /// server is unreachable or rejects the credentials.
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn ConfigurationClient>>;
}

impl<C: Connector + ?Sized> Connector for &C {
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn ConfigurationClient>> {
        (**self).connect(endpoint, credentials)
    }
}

/// Typed client for one administrative session.
///
/// Every call blocks until the server answers.
pub trait ConfigurationClient: Send + Sync {
    // -------------------------------------------------------------------------
    // Activated configuration (read-only)
    // -------------------------------------------------------------------------

    /// Look up an activated data-source resource by name.
    fn lookup_resource(&self, name: &str) -> Result<Option<ResourceHandle>>;

    /// Resolve a server in the live server registry.
    fn lookup_server(&self, name: &str) -> Result<Option<ServerHandle>>;

    /// Encrypt a secret with the domain's encryption primitive.
    fn encrypt(&self, plaintext: &SecretString) -> Result<EncryptedCredential>;

    // -------------------------------------------------------------------------
    // Change manager
    // -------------------------------------------------------------------------

    /// Acquire the exclusive edit lock.
    ///
    /// Fails with [`Error::EditLockUnavailable`](crate::Error::EditLockUnavailable)
    /// when another session holds it.
    fn start_edit(&self) -> Result<()>;

    /// Persist staged edits to the pending change set.
    fn save(&self) -> Result<()>;

    /// Apply the pending change set and wait until the servers have it.
    ///
    /// Blocks without a deadline.
    fn activate(&self) -> Result<()>;

    /// Discard staged and pending edits and release the lock.
    fn cancel_edit(&self) -> Result<()>;

    // -------------------------------------------------------------------------
    // Edit tree
    // -------------------------------------------------------------------------

    /// Create a data-source resource.
    fn create_resource(&self, name: &str) -> Result<ResourceHandle>;

    /// Name the resource's nested descriptor.
    fn set_descriptor_name(&self, resource: &ResourceHandle, name: &str) -> Result<()>;

    /// Set the data-source JNDI names.
    fn set_jndi_names(&self, resource: &ResourceHandle, names: &[String]) -> Result<()>;

    /// Set driver class and connection URL.
    fn set_driver_settings(&self, resource: &ResourceHandle, settings: &DriverSettings)
    -> Result<()>;

    /// Attach an encrypted database password to the driver parameters.
    fn set_encrypted_password(
        &self,
        resource: &ResourceHandle,
        credential: &EncryptedCredential,
    ) -> Result<()>;

    /// Look up a property in the driver property set.
    fn lookup_driver_property(
        &self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<Option<PropertyHandle>>;

    /// Create a property in the driver property set.
    fn create_driver_property(&self, resource: &ResourceHandle, name: &str)
    -> Result<PropertyHandle>;

    /// Set a driver property's value.
    fn set_property_value(&self, property: &PropertyHandle, value: &str) -> Result<()>;

    /// Set connection pool parameters.
    fn set_pool_settings(&self, resource: &ResourceHandle, settings: &PoolSettings) -> Result<()>;

    /// Target the resource to a resolved server.
    fn add_target(&self, resource: &ResourceHandle, server: &ServerHandle) -> Result<()>;

    /// Target a saved resource to a server or cluster by name.
    ///
    /// Operates on saved names, so the resource must have been persisted with
    /// [`save`](Self::save) first.
    fn assign_target_by_name(&self, resource_name: &str, target_name: &str) -> Result<()>;

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------

    /// End the session.
    fn disconnect(&self) -> Result<()>;
}
