//! Binding the resource to its target.
//!
//! A target found in the live server registry is bound directly inside the
//! edit session. Anything else (a cluster, say) goes through name-based
//! assignment, which only sees saved configuration: staged edits must be
//! saved before the assignment call, in that order.

use log::info;

use crate::error::Result;
use crate::transaction::EditTransaction;
use crate::types::{ResourceHandle, TargetBinding, TargetRef};

/// Bind `resource` to `target_name` and report which path was taken.
pub fn assign(
    tx: &mut EditTransaction<'_>,
    resource: &ResourceHandle,
    target_name: &str,
) -> Result<TargetBinding> {
    let target = match tx.lookup_server(target_name)? {
        Some(server) => {
            info!("Targeting {} to server {}", resource.name(), server.name());
            tx.add_target(resource, &server)?;
            TargetRef::Resolved(server)
        }
        None => {
            info!("Server {target_name} not found, using name-based assignment");
            tx.save()?;
            tx.assign_target_by_name(resource.name(), target_name)?;
            TargetRef::Unresolved(target_name.to_string())
        }
    };

    Ok(TargetBinding {
        resource: resource.name().to_string(),
        target,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, MockDomain};
    use crate::session::{AdminSession, SessionManager};
    use crate::types::{Credentials, Endpoint, TargetPath};

    fn open(domain: &MockDomain) -> AdminSession {
        SessionManager::new(domain)
            .open(
                &Endpoint::parse("t3://localhost:7001").unwrap(),
                &Credentials::new("weblogic", "welcome1"),
            )
            .unwrap()
    }

    fn bind(domain: &MockDomain, target: &str) -> TargetBinding {
        let mut session = open(domain);
        let mut tx = session.begin_edit().unwrap();
        let handle = tx.create_resource("DS").unwrap();
        let binding = assign(&mut tx, &handle, target).unwrap();
        tx.commit().unwrap();
        binding
    }

    #[test]
    fn test_direct_path_for_known_server() {
        let domain = MockDomain::new();
        let binding = bind(&domain, "AdminServer");

        assert_eq!(binding.path(), TargetPath::Direct);
        assert_eq!(domain.resource("DS").unwrap().targets, vec!["AdminServer"]);

        let journal = domain.journal();
        assert!(journal.contains(&Call::AddTarget("AdminServer".into())));
        assert!(!journal.iter().any(|c| matches!(c, Call::AssignTargetByName { .. })));
    }

    #[test]
    fn test_fallback_saves_before_assigning() {
        let domain = MockDomain::new();
        domain.add_cluster("booking-cluster");
        let binding = bind(&domain, "booking-cluster");

        assert_eq!(binding.path(), TargetPath::NameFallback);
        assert_eq!(binding.target_name(), "booking-cluster");

        let save = domain.position(|c| *c == Call::Save).unwrap();
        let assign = domain
            .position(|c| matches!(c, Call::AssignTargetByName { .. }))
            .unwrap();
        assert!(save < assign);
    }

    #[test]
    fn test_both_paths_converge() {
        let direct = MockDomain::new();
        direct.add_server("ms1");
        bind(&direct, "ms1");

        let fallback = MockDomain::new();
        fallback.add_cluster("ms1");
        bind(&fallback, "ms1");

        assert_eq!(
            direct.resource("DS").unwrap().targets,
            fallback.resource("DS").unwrap().targets
        );
    }

    #[test]
    fn test_unknown_target_fails() {
        let domain = MockDomain::new();
        let mut session = open(&domain);
        let mut tx = session.begin_edit().unwrap();
        let handle = tx.create_resource("DS").unwrap();

        assert!(assign(&mut tx, &handle, "nowhere").is_err());
    }
}
