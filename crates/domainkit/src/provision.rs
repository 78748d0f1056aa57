//! End-to-end provisioning of one data source.
//!
//! Open session → existence check → edit transaction (create, credentials,
//! target, commit) → close session. The session is closed however the run
//! ends, and any failure inside the transaction discards its edits before
//! the original error is reported.

use log::info;

use crate::backend::Connector;
use crate::credential;
use crate::error::{Error, Result};
use crate::guard;
use crate::resource;
use crate::session::{AdminSession, SessionManager};
use crate::target;
use crate::types::{
    Credentials, Endpoint, ProvisionOutcome, ProvisionStep, ResourceSpec, TargetBinding,
};

/// Progress callback for provisioning runs.
///
/// Implement this trait to show progress to an operator; the library itself
/// only logs.
pub trait ProvisionProgress {
    /// Called before connecting.
    fn on_connect(&mut self, endpoint: &Endpoint);

    /// Called when the data source already exists and nothing will change.
    fn on_already_exists(&mut self, name: &str);

    /// Called when the edit session is open and creation starts.
    fn on_create(&mut self, name: &str);

    /// Called once the resource is bound, before commit.
    fn on_target(&mut self, binding: &TargetBinding);

    /// Called after a failure inside the edit session, once edits are discarded.
    fn on_rollback(&mut self, error: &Error);
}

/// No-op progress callback.
pub struct NoProgress;

impl ProvisionProgress for NoProgress {
    fn on_connect(&mut self, _endpoint: &Endpoint) {}
    fn on_already_exists(&mut self, _name: &str) {}
    fn on_create(&mut self, _name: &str) {}
    fn on_target(&mut self, _binding: &TargetBinding) {}
    fn on_rollback(&mut self, _error: &Error) {}
}

/// Connect, provision `spec`, and disconnect.
pub fn provision<C: Connector>(
    connector: C,
    endpoint: &Endpoint,
    credentials: &Credentials,
    spec: &ResourceSpec,
    progress: &mut dyn ProvisionProgress,
) -> ProvisionOutcome {
    progress.on_connect(endpoint);
    let manager = SessionManager::new(connector);
    let mut session = match manager.open(endpoint, credentials) {
        Ok(session) => session,
        Err(error) => return ProvisionOutcome::Failed { error },
    };

    let outcome = provision_in_session(&mut session, spec, progress);
    manager.close(session);
    outcome
}

/// Provision `spec` over an already open session.
///
/// The session stays open; closing it is the caller's job.
pub fn provision_in_session(
    session: &mut AdminSession,
    spec: &ResourceSpec,
    progress: &mut dyn ProvisionProgress,
) -> ProvisionOutcome {
    match guard::lookup(session, &spec.name) {
        Ok(Some(_)) => {
            progress.on_already_exists(&spec.name);
            return ProvisionOutcome::AlreadyExists {
                name: spec.name.clone(),
            };
        }
        Ok(None) => {}
        Err(error) => return ProvisionOutcome::Failed { error },
    }

    let mut tx = match session.begin_edit() {
        Ok(tx) => tx,
        Err(error) => return ProvisionOutcome::Failed { error },
    };

    progress.on_create(&spec.name);
    let result = tx.run(|tx| {
        let handle = resource::create(tx, spec).map_err(|e| e.during(ProvisionStep::CreateResource))?;
        credential::attach(tx, &handle, spec).map_err(|e| e.during(ProvisionStep::Credentials))?;
        let binding = target::assign(tx, &handle, &spec.target_name)
            .map_err(|e| e.during(ProvisionStep::Target))?;
        progress.on_target(&binding);
        Ok(binding)
    });

    match result {
        Ok(binding) => {
            info!(
                "Data source {} created and targeted to {} ({})",
                binding.resource,
                binding.target_name(),
                binding.path()
            );
            ProvisionOutcome::Created { binding }
        }
        Err(error) => {
            progress.on_rollback(&error);
            ProvisionOutcome::Failed { error }
        }
    }
}

/// [`provision`] returning a `Result`, without progress reporting.
pub fn provision_simple<C: Connector>(
    connector: C,
    endpoint: &Endpoint,
    credentials: &Credentials,
    spec: &ResourceSpec,
) -> Result<ProvisionOutcome> {
    provision(connector, endpoint, credentials, spec, &mut NoProgress).into_result()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, DataSourceRecord, MockDomain};
    use crate::types::TargetPath;

    fn endpoint() -> Endpoint {
        Endpoint::parse("t3://localhost:7001").unwrap()
    }

    fn admin() -> Credentials {
        Credentials::new("weblogic", "welcome1")
    }

    fn spec() -> ResourceSpec {
        ResourceSpec::new(
            "CarBookingDS",
            "jdbc/CarBookingDS",
            "org.apache.derby.jdbc.EmbeddedDriver",
            "jdbc:derby:milesofsmiles;create=true",
            "AdminServer",
        )
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl ProvisionProgress for Recorder {
        fn on_connect(&mut self, endpoint: &Endpoint) {
            self.events.push(format!("connect {endpoint}"));
        }
        fn on_already_exists(&mut self, name: &str) {
            self.events.push(format!("exists {name}"));
        }
        fn on_create(&mut self, name: &str) {
            self.events.push(format!("create {name}"));
        }
        fn on_target(&mut self, binding: &TargetBinding) {
            self.events.push(format!("target {}", binding.target_name()));
        }
        fn on_rollback(&mut self, _error: &Error) {
            self.events.push("rollback".to_string());
        }
    }

    #[test]
    fn test_provision_creates_and_targets() {
        let domain = MockDomain::new();
        let mut recorder = Recorder::default();

        let outcome = provision(&domain, &endpoint(), &admin(), &spec(), &mut recorder);

        match outcome {
            ProvisionOutcome::Created { binding } => {
                assert_eq!(binding.path(), TargetPath::Direct);
                assert_eq!(binding.target_name(), "AdminServer");
            }
            other => panic!("expected Created, got {other:?}"),
        }
        assert_eq!(
            domain.resource("CarBookingDS").unwrap().targets,
            vec!["AdminServer"]
        );
        assert_eq!(
            recorder.events,
            vec![
                "connect t3://localhost:7001",
                "create CarBookingDS",
                "target AdminServer"
            ]
        );
        assert_eq!(domain.journal().last(), Some(&Call::Disconnect));
        assert!(!domain.is_locked());
    }

    #[test]
    fn test_provision_is_idempotent() {
        let domain = MockDomain::new();

        let first = provision_simple(&domain, &endpoint(), &admin(), &spec()).unwrap();
        assert!(first.is_change());

        domain.clear_journal();
        let second = provision_simple(&domain, &endpoint(), &admin(), &spec()).unwrap();
        assert!(matches!(second, ProvisionOutcome::AlreadyExists { ref name } if name == "CarBookingDS"));
        assert!(!second.is_change());

        assert_eq!(domain.resource_count(), 1);
        let journal = domain.journal();
        assert!(!journal.contains(&Call::StartEdit));
        assert!(!journal.iter().any(Call::is_mutation));
        assert_eq!(journal.last(), Some(&Call::Disconnect));
    }

    #[test]
    fn test_existing_resource_is_left_alone() {
        let domain = MockDomain::new();
        domain.insert_resource(DataSourceRecord {
            name: "CarBookingDS".into(),
            jndi_names: vec!["jdbc/Legacy".into()],
            ..DataSourceRecord::default()
        });
        let mut recorder = Recorder::default();

        let outcome = provision(&domain, &endpoint(), &admin(), &spec(), &mut recorder);

        assert!(matches!(outcome, ProvisionOutcome::AlreadyExists { .. }));
        assert_eq!(
            domain.resource("CarBookingDS").unwrap().jndi_names,
            vec!["jdbc/Legacy"]
        );
        assert!(recorder.events.contains(&"exists CarBookingDS".to_string()));
    }

    #[test]
    fn test_failure_after_create_rolls_back() {
        let domain = MockDomain::new();
        domain.fail_when(|call| matches!(call, Call::LookupServer(_)));
        let mut recorder = Recorder::default();

        let outcome = provision(&domain, &endpoint(), &admin(), &spec(), &mut recorder);

        let ProvisionOutcome::Failed { error } = outcome else {
            panic!("expected Failed");
        };
        assert_eq!(error.step(), Some(ProvisionStep::Target));
        assert!(matches!(
            error.root_cause(),
            Error::Remote {
                operation: "lookupServer",
                ..
            }
        ));

        assert_eq!(domain.resource_count(), 0);
        assert!(!domain.has_pending_changes());
        assert!(!domain.is_locked());

        let journal = domain.journal();
        assert!(journal.contains(&Call::CreateResource("CarBookingDS".into())));
        assert!(journal.contains(&Call::CancelEdit));
        assert!(!journal.contains(&Call::Activate));
        assert_eq!(journal.last(), Some(&Call::Disconnect));
        assert_eq!(recorder.events.last().map(String::as_str), Some("rollback"));
    }

    #[test]
    fn test_rollback_failure_does_not_mask_cause() {
        let domain = MockDomain::new();
        domain.fail_when(|call| *call == Call::SetPoolSettings);
        domain.fail_when(|call| *call == Call::CancelEdit);

        let err = provision_simple(&domain, &endpoint(), &admin(), &spec()).unwrap_err();

        assert_eq!(err.step(), Some(ProvisionStep::CreateResource));
        assert!(matches!(
            err.root_cause(),
            Error::Remote {
                operation: "setPoolSettings",
                ..
            }
        ));
        assert_eq!(domain.journal().last(), Some(&Call::Disconnect));
    }

    #[test]
    fn test_connection_failure_never_edits() {
        let domain = MockDomain::new();
        domain.set_reachable(false);

        let err = provision_simple(&domain, &endpoint(), &admin(), &spec()).unwrap_err();

        assert!(matches!(err, Error::Connection { .. }));
        assert_eq!(domain.journal().len(), 1);
    }

    #[test]
    fn test_edit_lock_unavailable_propagates() {
        let domain = MockDomain::new();
        domain.lock_by_other_session();

        let err = provision_simple(&domain, &endpoint(), &admin(), &spec()).unwrap_err();

        assert!(matches!(err, Error::EditLockUnavailable(_)));
        assert!(err.step().is_none());
        let journal = domain.journal();
        assert!(!journal.contains(&Call::CancelEdit));
        assert!(!journal.iter().any(|c| matches!(c, Call::CreateResource(_))));
        assert_eq!(journal.last(), Some(&Call::Disconnect));
    }

    #[test]
    fn test_fallback_target_end_to_end() {
        let domain = MockDomain::new();
        domain.add_cluster("BookingCluster");
        let mut spec = spec();
        spec.target_name = "BookingCluster".into();

        let outcome = provision_simple(&domain, &endpoint(), &admin(), &spec).unwrap();

        let ProvisionOutcome::Created { binding } = outcome else {
            panic!("expected Created");
        };
        assert_eq!(binding.path(), TargetPath::NameFallback);
        assert_eq!(
            domain.resource("CarBookingDS").unwrap().targets,
            vec!["BookingCluster"]
        );

        let save = domain.position(|c| *c == Call::Save).unwrap();
        let assign = domain
            .position(|c| matches!(c, Call::AssignTargetByName { .. }))
            .unwrap();
        assert!(save < assign);
    }

    #[test]
    fn test_credentials_end_to_end() {
        let domain = MockDomain::new();
        let spec = spec().db_user("app").db_password("app-secret");

        provision_simple(&domain, &endpoint(), &admin(), &spec).unwrap();

        let record = domain.resource("CarBookingDS").unwrap();
        assert_eq!(record.properties.get("user"), Some(&Some("app".to_string())));
        let stored = record.password_encrypted.unwrap();
        assert!(stored.starts_with("{AES256}"));
        assert_ne!(stored, "app-secret");
    }
}
