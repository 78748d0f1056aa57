//! The edit transaction.
//!
//! An [`EditTransaction`] is the explicit handle for one edit session. Every
//! configuration mutation goes through it, and it only allows them while
//! the edit lock is held:
//!
//! ```text
//! NotStarted ──begin──▶ Editing ──commit──▶ Activating ──▶ Committed
//!                          │                     │
//!                          └──────cancel─────────┴──────▶ Cancelled
//! ```
//!
//! Calling a mutation outside `Editing` is a bug in the caller and panics.
//! Cancelling never fails: a failed remote discard is logged, because a
//! cancel always follows an earlier error that matters more.

use log::{debug, info, warn};
use secrecy::SecretString;

use crate::backend::ConfigurationClient;
use crate::error::{Error, Result};
use crate::types::{
    DriverSettings, EncryptedCredential, PoolSettings, PropertyHandle, ProvisionStep,
    ResourceHandle, ServerHandle, TxState,
};

/// One edit session against a domain's configuration tree.
pub struct EditTransaction<'s> {
    client: &'s dyn ConfigurationClient,
    state: TxState,
}

impl<'s> EditTransaction<'s> {
    pub(crate) fn new(client: &'s dyn ConfigurationClient) -> Self {
        Self {
            client,
            state: TxState::NotStarted,
        }
    }

    /// Current state.
    pub fn state(&self) -> TxState {
        self.state
    }

    /// Acquire the exclusive edit lock.
    pub fn begin(&mut self) -> Result<()> {
        assert_eq!(
            self.state,
            TxState::NotStarted,
            "begin() on a transaction that is already {}",
            self.state
        );
        self.client.start_edit()?;
        self.state = TxState::Editing;
        info!("Edit session started");
        Ok(())
    }

    /// The client, if the transaction is accepting edits.
    fn editing(&self, operation: &str) -> &'s dyn ConfigurationClient {
        assert!(
            self.state == TxState::Editing,
            "{operation} requires an open edit session, but the transaction is {}",
            self.state
        );
        self.client
    }

    /// Persist staged edits and activate them, blocking until the servers
    /// have applied the change set. There is no timeout.
    pub fn commit(&mut self) -> Result<()> {
        let client = self.editing("commit");
        self.state = TxState::Activating;
        client.save()?;
        debug!("Staged edits saved; activating");
        client.activate()?;
        self.state = TxState::Committed;
        info!("Edit session activated");
        Ok(())
    }

    /// Discard staged edits and release the lock.
    ///
    /// Only acts while `Editing` or `Activating`; a remote failure is logged
    /// and the transaction still ends `Cancelled`.
    pub fn cancel(&mut self) {
        if !self.state.is_open() {
            debug!("Nothing to cancel; transaction is {}", self.state);
            return;
        }
        if let Err(e) = self.client.cancel_edit() {
            warn!("{}", Error::Cleanup(format!("discarding edits: {e}")));
        }
        self.state = TxState::Cancelled;
        info!("Edits discarded");
    }

    /// Stage edits with `stage`, then commit.
    ///
    /// If staging or committing fails, the transaction is cancelled and the
    /// original error is returned; a commit failure is tagged
    /// [`ProvisionStep::Commit`].
    pub fn run<T>(&mut self, stage: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = match stage(self) {
            Ok(value) => self
                .commit()
                .map(|()| value)
                .map_err(|e| e.during(ProvisionStep::Commit)),
            Err(e) => Err(e),
        };

        if let Err(error) = &result {
            warn!("Error occurred; undoing edits: {error}");
            self.cancel();
        }
        result
    }

    // -------------------------------------------------------------------------
    // Reads and session primitives
    // -------------------------------------------------------------------------

    /// Resolve a server in the live registry.
    pub fn lookup_server(&self, name: &str) -> Result<Option<ServerHandle>> {
        self.client.lookup_server(name)
    }

    /// Encrypt a secret with the session's encryption primitive.
    pub fn encrypt(&self, plaintext: &SecretString) -> Result<EncryptedCredential> {
        self.client.encrypt(plaintext)
    }

    // -------------------------------------------------------------------------
    // Mutations (Editing only)
    // -------------------------------------------------------------------------

    /// Create a data-source resource.
    pub fn create_resource(&mut self, name: &str) -> Result<ResourceHandle> {
        self.editing("create_resource").create_resource(name)
    }

    /// Name the resource's nested descriptor.
    pub fn set_descriptor_name(&mut self, resource: &ResourceHandle, name: &str) -> Result<()> {
        self.editing("set_descriptor_name")
            .set_descriptor_name(resource, name)
    }

    /// Set the data-source JNDI names.
    pub fn set_jndi_names(&mut self, resource: &ResourceHandle, names: &[String]) -> Result<()> {
        self.editing("set_jndi_names").set_jndi_names(resource, names)
    }

    /// Set driver class and URL.
    pub fn set_driver_settings(
        &mut self,
        resource: &ResourceHandle,
        settings: &DriverSettings,
    ) -> Result<()> {
        self.editing("set_driver_settings")
            .set_driver_settings(resource, settings)
    }

    /// Attach an encrypted database password.
    pub fn set_encrypted_password(
        &mut self,
        resource: &ResourceHandle,
        credential: &EncryptedCredential,
    ) -> Result<()> {
        self.editing("set_encrypted_password")
            .set_encrypted_password(resource, credential)
    }

    /// Look up a driver property.
    pub fn lookup_driver_property(
        &mut self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<Option<PropertyHandle>> {
        self.editing("lookup_driver_property")
            .lookup_driver_property(resource, name)
    }

    /// Create a driver property.
    pub fn create_driver_property(
        &mut self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<PropertyHandle> {
        self.editing("create_driver_property")
            .create_driver_property(resource, name)
    }

    /// Set a driver property's value.
    pub fn set_property_value(&mut self, property: &PropertyHandle, value: &str) -> Result<()> {
        self.editing("set_property_value")
            .set_property_value(property, value)
    }

    /// Set connection pool parameters.
    pub fn set_pool_settings(
        &mut self,
        resource: &ResourceHandle,
        settings: &PoolSettings,
    ) -> Result<()> {
        self.editing("set_pool_settings")
            .set_pool_settings(resource, settings)
    }

    /// Target the resource to a resolved server.
    pub fn add_target(&mut self, resource: &ResourceHandle, server: &ServerHandle) -> Result<()> {
        self.editing("add_target").add_target(resource, server)
    }

    /// Persist staged edits without activating them.
    pub fn save(&mut self) -> Result<()> {
        self.editing("save").save()
    }

    /// Target a saved resource by name.
    pub fn assign_target_by_name(&mut self, resource_name: &str, target_name: &str) -> Result<()> {
        self.editing("assign_target_by_name")
            .assign_target_by_name(resource_name, target_name)
    }
}

impl Drop for EditTransaction<'_> {
    fn drop(&mut self) {
        if self.state.is_open() {
            warn!("Edit session dropped while {}; discarding edits", self.state);
            self.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, MockDomain};
    use crate::session::{AdminSession, SessionManager};
    use crate::types::{Credentials, Endpoint};

    fn open(domain: &MockDomain) -> AdminSession {
        SessionManager::new(domain)
            .open(
                &Endpoint::parse("t3://localhost:7001").unwrap(),
                &Credentials::new("weblogic", "welcome1"),
            )
            .unwrap()
    }

    #[test]
    fn test_begin_commit() {
        let domain = MockDomain::new();
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        assert_eq!(tx.state(), TxState::Editing);

        tx.create_resource("DS").unwrap();
        tx.commit().unwrap();
        assert_eq!(tx.state(), TxState::Committed);
        assert!(domain.resource("DS").is_some());
    }

    #[test]
    fn test_begin_fails_when_locked() {
        let domain = MockDomain::new();
        domain.lock_by_other_session();
        let mut session = open(&domain);

        assert!(matches!(
            session.begin_edit(),
            Err(Error::EditLockUnavailable(_))
        ));
        assert!(!domain.journal().contains(&Call::CancelEdit));
    }

    #[test]
    fn test_cancel_discards_staged_edits() {
        let domain = MockDomain::new();
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        tx.create_resource("DS").unwrap();
        tx.cancel();

        assert_eq!(tx.state(), TxState::Cancelled);
        assert_eq!(domain.resource_count(), 0);
        assert!(!domain.is_locked());
    }

    #[test]
    fn test_cancel_after_commit_is_a_no_op() {
        let domain = MockDomain::new();
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        tx.commit().unwrap();
        tx.cancel();

        assert_eq!(tx.state(), TxState::Committed);
        assert!(!domain.journal().contains(&Call::CancelEdit));
    }

    #[test]
    fn test_cancel_swallows_remote_failure() {
        let domain = MockDomain::new();
        domain.fail_when(|call| *call == Call::CancelEdit);
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        tx.cancel();
        assert_eq!(tx.state(), TxState::Cancelled);
    }

    #[test]
    fn test_failed_activation_cancels_from_activating() {
        let domain = MockDomain::new();
        domain.fail_when(|call| *call == Call::Activate);
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        let result = tx.run(|tx| tx.create_resource("DS"));

        let err = result.unwrap_err();
        assert_eq!(err.step(), Some(ProvisionStep::Commit));
        assert_eq!(tx.state(), TxState::Cancelled);
        assert_eq!(domain.resource_count(), 0);
        assert!(!domain.has_pending_changes());
    }

    #[test]
    fn test_run_returns_original_error_after_rollback() {
        let domain = MockDomain::new();
        domain.fail_when(|call| *call == Call::SetPoolSettings);
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        let result = tx.run(|tx| {
            let handle = tx.create_resource("DS")?;
            tx.set_pool_settings(&handle, &PoolSettings::health_check())
        });

        match result {
            Err(Error::Remote { operation, .. }) => assert_eq!(operation, "setPoolSettings"),
            other => panic!("expected the injected failure, got {other:?}"),
        }
        assert_eq!(tx.state(), TxState::Cancelled);

        let journal = domain.journal();
        let failed = journal.iter().position(|c| *c == Call::SetPoolSettings).unwrap();
        let cancelled = journal.iter().position(|c| *c == Call::CancelEdit).unwrap();
        assert!(failed < cancelled);
    }

    #[test]
    fn test_drop_while_editing_cancels() {
        let domain = MockDomain::new();
        let mut session = open(&domain);
        {
            let mut tx = session.begin_edit().unwrap();
            tx.create_resource("DS").unwrap();
        }
        assert!(domain.journal().contains(&Call::CancelEdit));
        assert!(!domain.is_locked());
    }

    #[test]
    #[should_panic(expected = "requires an open edit session")]
    fn test_mutation_after_commit_panics() {
        let domain = MockDomain::new();
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        tx.commit().unwrap();
        let _ = tx.create_resource("DS");
    }

    #[test]
    #[should_panic(expected = "requires an open edit session")]
    fn test_mutation_after_cancel_panics() {
        let domain = MockDomain::new();
        let mut session = open(&domain);

        let mut tx = session.begin_edit().unwrap();
        tx.cancel();
        let _ = tx.save();
    }
}
