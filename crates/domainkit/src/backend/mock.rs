//! In-memory domain for tests.
//!
//! [`MockDomain`] simulates an administration server: an activated
//! configuration, a pending (saved) change set, in-memory staged edits, an
//! edit lock shared by all sessions, a server/cluster registry and a journal
//! of every call made against it. Failures can be injected per call.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use secrecy::{ExposeSecret, SecretString};

use super::{ConfigurationClient, Connector};
use crate::error::{Error, Result};
use crate::types::{
    Credentials, DriverSettings, EncryptedCredential, Endpoint, PoolSettings, PropertyHandle,
    ResourceHandle, ServerHandle,
};

/// Key for the mock encryption primitive.
const ENCRYPTION_KEY: [u8; 32] = *b"mock-domain-serialized-system-in";

/// A call recorded in the mock domain's journal.
///
/// Secrets are never recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect { user: String },
    Disconnect,
    LookupResource(String),
    LookupServer(String),
    Encrypt,
    StartEdit,
    Save,
    Activate,
    CancelEdit,
    CreateResource(String),
    SetDescriptorName(String),
    SetJndiNames(Vec<String>),
    SetDriverSettings,
    SetEncryptedPassword,
    LookupDriverProperty(String),
    CreateDriverProperty(String),
    SetPropertyValue(String),
    SetPoolSettings,
    AddTarget(String),
    AssignTargetByName { resource: String, target: String },
}

impl Call {
    /// Whether the call changes configuration (staged, saved or activated).
    pub fn is_mutation(&self) -> bool {
        !matches!(
            self,
            Call::Connect { .. }
                | Call::Disconnect
                | Call::LookupResource(_)
                | Call::LookupServer(_)
                | Call::Encrypt
                | Call::LookupDriverProperty(_)
        )
    }
}

/// A data source as stored in the mock domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSourceRecord {
    pub name: String,
    pub descriptor_name: Option<String>,
    pub jndi_names: Vec<String>,
    pub driver_class: Option<String>,
    pub url: Option<String>,
    pub password_encrypted: Option<String>,
    pub properties: BTreeMap<String, Option<String>>,
    pub test_connections_on_reserve: bool,
    pub test_table_name: Option<String>,
    pub targets: Vec<String>,
}

type Config = BTreeMap<String, DataSourceRecord>;
type FailurePredicate = Box<dyn Fn(&Call) -> bool + Send + Sync>;

struct DomainState {
    admin_user: String,
    admin_password: String,
    reachable: bool,
    servers: BTreeSet<String>,
    clusters: BTreeSet<String>,
    activated: Config,
    saved: Option<Config>,
    staged: Option<Config>,
    lock_holder: Option<u64>,
    next_session: u64,
    journal: Vec<Call>,
    failures: Vec<FailurePredicate>,
}

impl DomainState {
    fn check_lock(&self, session: u64, operation: &'static str) -> Result<()> {
        match self.lock_holder {
            Some(holder) if holder == session => Ok(()),
            _ => Err(Error::remote(operation, "no edit session is active")),
        }
    }

    fn staged_mut(&mut self, session: u64, operation: &'static str) -> Result<&mut Config> {
        self.check_lock(session, operation)?;
        self.staged
            .as_mut()
            .ok_or_else(|| Error::remote(operation, "no edit session is active"))
    }

    fn staged_record(
        &mut self,
        session: u64,
        operation: &'static str,
        name: &str,
    ) -> Result<&mut DataSourceRecord> {
        self.staged_mut(session, operation)?
            .get_mut(name)
            .ok_or_else(|| Error::not_found("data source", name))
    }

    fn release(&mut self) {
        self.saved = None;
        self.staged = None;
        self.lock_holder = None;
    }
}

/// An in-memory administration server.
///
/// Clones share the same domain, so several sessions (and the test that
/// inspects the result) see one configuration and one edit lock.
#[derive(Clone)]
pub struct MockDomain {
    state: Arc<Mutex<DomainState>>,
}

impl MockDomain {
    /// Create a domain with admin login `weblogic`/`welcome1` and one server,
    /// `AdminServer`.
    pub fn new() -> Self {
        Self::with_admin("weblogic", "welcome1")
    }

    /// Create a domain with the given admin login and one server, `AdminServer`.
    pub fn with_admin(user: impl Into<String>, password: impl Into<String>) -> Self {
        let state = DomainState {
            admin_user: user.into(),
            admin_password: password.into(),
            reachable: true,
            servers: BTreeSet::from(["AdminServer".to_string()]),
            clusters: BTreeSet::new(),
            activated: Config::new(),
            saved: None,
            staged: None,
            lock_holder: None,
            next_session: 1,
            journal: Vec::new(),
            failures: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DomainState> {
        self.state.lock().unwrap()
    }

    /// Register a managed server.
    pub fn add_server(&self, name: impl Into<String>) {
        self.lock().servers.insert(name.into());
    }

    /// Register a cluster (a target that is not a server).
    pub fn add_cluster(&self, name: impl Into<String>) {
        self.lock().clusters.insert(name.into());
    }

    /// Make the server unreachable (or reachable again).
    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Simulate another administrator holding the edit lock.
    pub fn lock_by_other_session(&self) {
        let mut state = self.lock();
        let other = state.next_session;
        state.next_session += 1;
        state.lock_holder = Some(other);
    }

    /// Whether any session holds the edit lock.
    pub fn is_locked(&self) -> bool {
        self.lock().lock_holder.is_some()
    }

    /// Fail every call matching `predicate` with a remote error.
    pub fn fail_when(&self, predicate: impl Fn(&Call) -> bool + Send + Sync + 'static) {
        self.lock().failures.push(Box::new(predicate));
    }

    /// Put an activated data source straight into the domain.
    pub fn insert_resource(&self, record: DataSourceRecord) {
        self.lock().activated.insert(record.name.clone(), record);
    }

    /// An activated data source.
    pub fn resource(&self, name: &str) -> Option<DataSourceRecord> {
        self.lock().activated.get(name).cloned()
    }

    /// Number of activated data sources.
    pub fn resource_count(&self) -> usize {
        self.lock().activated.len()
    }

    /// Whether a change set is pending (saved but not activated).
    pub fn has_pending_changes(&self) -> bool {
        self.lock().saved.is_some()
    }

    /// Every call made so far.
    pub fn journal(&self) -> Vec<Call> {
        self.lock().journal.clone()
    }

    /// Forget recorded calls.
    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }

    /// Position of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Call) -> bool) -> Option<usize> {
        self.lock().journal.iter().position(predicate)
    }

    /// Record `call`, apply injected failures, and hand back the state.
    fn record(&self, call: Call, operation: &'static str) -> Result<MutexGuard<'_, DomainState>> {
        let mut state = self.lock();
        let fail = state.failures.iter().any(|predicate| predicate(&call));
        state.journal.push(call);
        if fail {
            return Err(Error::remote(operation, "injected failure"));
        }
        Ok(state)
    }
}

impl Default for MockDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockDomain {
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn ConfigurationClient>> {
        let call = Call::Connect {
            user: credentials.user.clone(),
        };
        let mut state = self
            .record(call, "connect")
            .map_err(|e| Error::connection(endpoint, e.to_string()))?;

        if !state.reachable {
            return Err(Error::connection(endpoint, "connection refused"));
        }
        if credentials.user != state.admin_user
            || credentials.password.expose_secret() != state.admin_password
        {
            return Err(Error::connection(endpoint, "authentication rejected"));
        }

        let session = state.next_session;
        state.next_session += 1;
        drop(state);

        Ok(Box::new(MockClient {
            domain: self.clone(),
            session,
        }))
    }
}

/// One session against a [`MockDomain`].
pub struct MockClient {
    domain: MockDomain,
    session: u64,
}

impl ConfigurationClient for MockClient {
    fn lookup_resource(&self, name: &str) -> Result<Option<ResourceHandle>> {
        let state = self
            .domain
            .record(Call::LookupResource(name.to_string()), "lookupResource")?;
        Ok(state
            .activated
            .contains_key(name)
            .then(|| ResourceHandle::new(name)))
    }

    fn lookup_server(&self, name: &str) -> Result<Option<ServerHandle>> {
        let state = self
            .domain
            .record(Call::LookupServer(name.to_string()), "lookupServer")?;
        Ok(state.servers.contains(name).then(|| ServerHandle::new(name)))
    }

    fn encrypt(&self, plaintext: &SecretString) -> Result<EncryptedCredential> {
        let _state = self.domain.record(Call::Encrypt, "encrypt")?;
        let digest = blake3::keyed_hash(&ENCRYPTION_KEY, plaintext.expose_secret().as_bytes());
        Ok(EncryptedCredential::new(format!("{{AES256}}{}", digest.to_hex())))
    }

    fn start_edit(&self) -> Result<()> {
        let mut state = self.domain.record(Call::StartEdit, "startEdit")?;
        match state.lock_holder {
            Some(holder) if holder != self.session => {
                return Err(Error::EditLockUnavailable(format!(
                    "another edit session ({holder}) holds the configuration lock"
                )));
            }
            Some(_) => return Ok(()),
            None => {}
        }
        let base = state.saved.clone().unwrap_or_else(|| state.activated.clone());
        state.lock_holder = Some(self.session);
        state.staged = Some(base);
        Ok(())
    }

    fn save(&self) -> Result<()> {
        let mut state = self.domain.record(Call::Save, "save")?;
        let staged = state.staged_mut(self.session, "save")?.clone();
        state.saved = Some(staged);
        Ok(())
    }

    fn activate(&self) -> Result<()> {
        let mut state = self.domain.record(Call::Activate, "activate")?;
        state.check_lock(self.session, "activate")?;
        if state.staged != state.saved && state.staged.as_ref() != Some(&state.activated) {
            return Err(Error::remote("activate", "edit session has unsaved changes"));
        }
        if let Some(saved) = state.saved.take() {
            state.activated = saved;
        }
        state.release();
        Ok(())
    }

    fn cancel_edit(&self) -> Result<()> {
        let mut state = self.domain.record(Call::CancelEdit, "cancelEdit")?;
        if state.lock_holder == Some(self.session) {
            state.release();
        }
        Ok(())
    }

    fn create_resource(&self, name: &str) -> Result<ResourceHandle> {
        let mut state = self
            .domain
            .record(Call::CreateResource(name.to_string()), "createResource")?;
        let staged = state.staged_mut(self.session, "createResource")?;
        if staged.contains_key(name) {
            return Err(Error::remote(
                "createResource",
                format!("data source {name} already exists"),
            ));
        }
        staged.insert(
            name.to_string(),
            DataSourceRecord {
                name: name.to_string(),
                ..DataSourceRecord::default()
            },
        );
        Ok(ResourceHandle::new(name))
    }

    fn set_descriptor_name(&self, resource: &ResourceHandle, name: &str) -> Result<()> {
        let mut state = self
            .domain
            .record(Call::SetDescriptorName(name.to_string()), "setDescriptorName")?;
        let record = state.staged_record(self.session, "setDescriptorName", resource.name())?;
        record.descriptor_name = Some(name.to_string());
        Ok(())
    }

    fn set_jndi_names(&self, resource: &ResourceHandle, names: &[String]) -> Result<()> {
        let mut state = self
            .domain
            .record(Call::SetJndiNames(names.to_vec()), "setJndiNames")?;
        let record = state.staged_record(self.session, "setJndiNames", resource.name())?;
        record.jndi_names = names.to_vec();
        Ok(())
    }

    fn set_driver_settings(
        &self,
        resource: &ResourceHandle,
        settings: &DriverSettings,
    ) -> Result<()> {
        let mut state = self
            .domain
            .record(Call::SetDriverSettings, "setDriverSettings")?;
        let record = state.staged_record(self.session, "setDriverSettings", resource.name())?;
        record.driver_class = Some(settings.driver_class.clone());
        record.url = Some(settings.url.clone());
        Ok(())
    }

    fn set_encrypted_password(
        &self,
        resource: &ResourceHandle,
        credential: &EncryptedCredential,
    ) -> Result<()> {
        let mut state = self
            .domain
            .record(Call::SetEncryptedPassword, "setEncryptedPassword")?;
        let record = state.staged_record(self.session, "setEncryptedPassword", resource.name())?;
        record.password_encrypted = Some(credential.expose().to_string());
        Ok(())
    }

    fn lookup_driver_property(
        &self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<Option<PropertyHandle>> {
        let mut state = self.domain.record(
            Call::LookupDriverProperty(name.to_string()),
            "lookupDriverProperty",
        )?;
        let record = state.staged_record(self.session, "lookupDriverProperty", resource.name())?;
        Ok(record
            .properties
            .contains_key(name)
            .then(|| PropertyHandle::new(resource.name(), name)))
    }

    fn create_driver_property(
        &self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<PropertyHandle> {
        let mut state = self.domain.record(
            Call::CreateDriverProperty(name.to_string()),
            "createDriverProperty",
        )?;
        let record = state.staged_record(self.session, "createDriverProperty", resource.name())?;
        if record.properties.contains_key(name) {
            return Err(Error::remote(
                "createDriverProperty",
                format!("property {name} already exists"),
            ));
        }
        record.properties.insert(name.to_string(), None);
        Ok(PropertyHandle::new(resource.name(), name))
    }

    fn set_property_value(&self, property: &PropertyHandle, value: &str) -> Result<()> {
        let mut state = self.domain.record(
            Call::SetPropertyValue(property.name().to_string()),
            "setPropertyValue",
        )?;
        let record = state.staged_record(self.session, "setPropertyValue", property.resource())?;
        let slot = record
            .properties
            .get_mut(property.name())
            .ok_or_else(|| Error::not_found("driver property", property.name()))?;
        *slot = Some(value.to_string());
        Ok(())
    }

    fn set_pool_settings(&self, resource: &ResourceHandle, settings: &PoolSettings) -> Result<()> {
        let mut state = self.domain.record(Call::SetPoolSettings, "setPoolSettings")?;
        let record = state.staged_record(self.session, "setPoolSettings", resource.name())?;
        record.test_connections_on_reserve = settings.test_connections_on_reserve;
        record.test_table_name = Some(settings.test_table_name.clone());
        Ok(())
    }

    fn add_target(&self, resource: &ResourceHandle, server: &ServerHandle) -> Result<()> {
        let mut state = self
            .domain
            .record(Call::AddTarget(server.name().to_string()), "addTarget")?;
        if !state.servers.contains(server.name()) {
            return Err(Error::not_found("server", server.name()));
        }
        let record = state.staged_record(self.session, "addTarget", resource.name())?;
        if !record.targets.iter().any(|t| t == server.name()) {
            record.targets.push(server.name().to_string());
        }
        Ok(())
    }

    fn assign_target_by_name(&self, resource_name: &str, target_name: &str) -> Result<()> {
        let call = Call::AssignTargetByName {
            resource: resource_name.to_string(),
            target: target_name.to_string(),
        };
        let mut state = self.domain.record(call, "assign")?;
        state.check_lock(self.session, "assign")?;

        if !state.servers.contains(target_name) && !state.clusters.contains(target_name) {
            return Err(Error::not_found("target", target_name));
        }

        // Name-based assignment only sees what has been saved.
        let saved = state
            .saved
            .as_mut()
            .and_then(|config| config.get_mut(resource_name))
            .ok_or_else(|| Error::not_found("saved data source", resource_name))?;
        if !saved.targets.iter().any(|t| t == target_name) {
            saved.targets.push(target_name.to_string());
        }

        if let Some(record) = state
            .staged
            .as_mut()
            .and_then(|config| config.get_mut(resource_name))
        {
            if !record.targets.iter().any(|t| t == target_name) {
                record.targets.push(target_name.to_string());
            }
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<()> {
        let _state = self.domain.record(Call::Disconnect, "disconnect")?;
        Ok(())
    }
}
