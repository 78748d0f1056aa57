//! Existence check run before any edit session is opened.

use log::info;

use crate::error::Result;
use crate::session::AdminSession;
use crate::types::ResourceHandle;

/// Look up an activated data source named `name`.
///
/// Takes the session by shared reference, so it cannot run while an edit
/// transaction borrows the session.
pub fn lookup(session: &AdminSession, name: &str) -> Result<Option<ResourceHandle>> {
    let existing = session.lookup_resource(name)?;
    if existing.is_some() {
        info!("Data source {name} already exists");
    }
    Ok(existing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Call, DataSourceRecord, MockDomain};
    use crate::session::SessionManager;
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
    fn test_lookup_missing() {
        let domain = MockDomain::new();
        let session = open(&domain);
        assert!(lookup(&session, "CarBookingDS").unwrap().is_none());
    }

    #[test]
    fn test_lookup_existing_does_not_start_edit() {
        let domain = MockDomain::new();
        domain.insert_resource(DataSourceRecord {
            name: "CarBookingDS".into(),
            ..DataSourceRecord::default()
        });
        let session = open(&domain);

        let found = lookup(&session, "CarBookingDS").unwrap();
        assert_eq!(found.unwrap().name(), "CarBookingDS");
        assert!(!domain.journal().contains(&Call::StartEdit));
    }
}
