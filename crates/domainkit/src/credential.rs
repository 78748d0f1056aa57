//! Optional database credentials.
//!
//! The password is encrypted by the session before anything is attached;
//! only the opaque result reaches the configuration tree. The user name is
//! stored as the `user` driver property, created if it does not exist yet.

use log::{debug, info};

use crate::error::Result;
use crate::transaction::EditTransaction;
use crate::types::{ResourceHandle, ResourceSpec};

/// Driver property holding the database user.
pub const USER_PROPERTY: &str = "user";

/// Attach whichever of `spec.db_password` and `spec.db_user` are present.
pub fn attach(
    tx: &mut EditTransaction<'_>,
    resource: &ResourceHandle,
    spec: &ResourceSpec,
) -> Result<()> {
    if let Some(password) = &spec.db_password {
        let credential = tx.encrypt(password)?;
        tx.set_encrypted_password(resource, &credential)?;
        info!("Encrypted database password attached to {}", resource.name());
    }

    if let Some(user) = &spec.db_user {
        let property = match tx.lookup_driver_property(resource, USER_PROPERTY)? {
            Some(property) => property,
            None => {
                debug!("Creating driver property '{USER_PROPERTY}' on {}", resource.name());
                tx.create_driver_property(resource, USER_PROPERTY)?
            }
        };
        tx.set_property_value(&property, user)?;
        info!("Database user {user} set on {}", resource.name());
    }

    Ok(())
}
