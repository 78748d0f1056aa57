//! Creation of the data-source resource and its nested parameters.

use log::{debug, info};

use crate::error::Result;
use crate::transaction::EditTransaction;
use crate::types::{PoolSettings, ResourceHandle, ResourceSpec};

/// Create the data source described by `spec` inside `tx`.
///
/// Sets the descriptor name and the single JNDI binding to `spec.jndi_name`,
/// the driver class and URL, and the pool health check. The returned handle
/// is only meaningful inside `tx` until it commits.
pub fn create(tx: &mut EditTransaction<'_>, spec: &ResourceSpec) -> Result<ResourceHandle> {
    info!("Creating data source {}", spec.name);
    let handle = tx.create_resource(&spec.name)?;

    tx.set_descriptor_name(&handle, &spec.jndi_name)?;

    debug!("{}: JNDI name {}", spec.name, spec.jndi_name);
    tx.set_jndi_names(&handle, std::slice::from_ref(&spec.jndi_name))?;

    debug!("{}: driver {} at {}", spec.name, spec.driver_class, spec.url);
    tx.set_driver_settings(&handle, &spec.driver_settings())?;

    let pool = PoolSettings::health_check();
    debug!(
        "{}: test connections on reserve against {}",
        spec.name, pool.test_table_name
    );
    tx.set_pool_settings(&handle, &pool)?;

    Ok(handle)
}
