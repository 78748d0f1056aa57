//! Administrative sessions.
//!
//! [`SessionManager`] opens sessions through a [`Connector`]; an
//! [`AdminSession`] owns the live client and releases it exactly once,
//! either through [`AdminSession::close`] or when dropped.

use log::{debug, info, warn};

use crate::backend::{ConfigurationClient, Connector};
use crate::error::{Error, Result};
use crate::transaction::EditTransaction;
use crate::types::{Credentials, Endpoint, ResourceHandle};

/// Opens and closes administrative sessions.
pub struct SessionManager<C> {
    connector: C,
}

impl<C: Connector> SessionManager<C> {
    /// Create a manager that opens sessions with `connector`.
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Open an authenticated session.
    ///
    /// Any failure is reported as [`Error::Connection`].
    pub fn open(&self, endpoint: &Endpoint, credentials: &Credentials) -> Result<AdminSession> {
        info!("Connecting to {endpoint} as {}", credentials.user);
        let client = self
            .connector
            .connect(endpoint, credentials)
            .map_err(|error| match error {
                Error::Connection { .. } => error,
                other => Error::connection(endpoint, other.to_string()),
            })?;
        Ok(AdminSession::new(endpoint.to_string(), client))
    }

    /// Close a session. Never fails; problems are logged.
    pub fn close(&self, mut session: AdminSession) {
        debug!("Closing session to {}", session.endpoint());
        session.close();
    }
}

/// A live administrative session.
///
/// Edit transactions borrow the session mutably, so a session drives at
/// most one transaction at a time, and the existence check (which borrows it
/// shared) cannot overlap an open transaction.
pub struct AdminSession {
    endpoint: String,
    client: Option<Box<dyn ConfigurationClient>>,
}

impl AdminSession {
    /// Wrap a connected client.
    pub fn new(endpoint: impl Into<String>, client: Box<dyn ConfigurationClient>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: Some(client),
        }
    }

    /// Endpoint the session is connected to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Whether the session was closed.
    pub fn is_closed(&self) -> bool {
        self.client.is_none()
    }

    fn client(&self) -> Result<&dyn ConfigurationClient> {
        self.client.as_deref().ok_or(Error::SessionClosed)
    }

    /// Look up an activated data source by name.
    pub fn lookup_resource(&self, name: &str) -> Result<Option<ResourceHandle>> {
        self.client()?.lookup_resource(name)
    }

    /// Acquire the edit lock and start a transaction.
    ///
    /// Fails with [`Error::EditLockUnavailable`] when another session holds
    /// the lock; no transaction exists in that case.
    pub fn begin_edit(&mut self) -> Result<EditTransaction<'_>> {
        let mut tx = EditTransaction::new(self.client()?);
        tx.begin()?;
        Ok(tx)
    }

    /// Disconnect. Idempotent; failures are logged and swallowed.
    pub fn close(&mut self) {
        let Some(client) = self.client.take() else {
            debug!("Session to {} already closed", self.endpoint);
            return;
        };

        match client.disconnect() {
            Ok(()) => info!("Disconnected from {}", self.endpoint),
            Err(e) => warn!("{}", Error::Cleanup(format!("disconnect from {}: {e}", self.endpoint))),
        }
    }
}

impl Drop for AdminSession {
    fn drop(&mut self) {
        self.close();
    }
}
