//! RESTful management API backend.
//!
//! This module provides [`RestConnector`] and [`RestClient`], which drive the
//! administration server's REST management interface
//! (`/management/weblogic/latest`). Reads of activated configuration go to
//! the `domainConfig` tree, writes go to the `edit` tree, and the
//! transaction verbs map to `edit/changeManager` actions.
//!
//! # Saving
//!
//! The REST edit tree persists every accepted write to the pending change
//! set immediately, so [`ConfigurationClient::save`] has nothing left to do
//! and only logs.
//!
//! # Encryption
//!
//! The REST interface has no client-side encryption primitive. The
//! credential handed back by [`ConfigurationClient::encrypt`] is posted once,
//! over the authenticated channel, to the driver parameters' write-only
//! `password` attribute; the server stores it encrypted.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::debug;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};
use ureq::http::Response;
use url::Url;

use super::{ConfigurationClient, Connector};
use crate::error::{Error, Result};
use crate::types::{
    Credentials, DriverSettings, EncryptedCredential, Endpoint, PoolSettings, PropertyHandle,
    ResourceHandle, ServerHandle,
};

/// Path of the management API below the server root.
const API_ROOT: [&str; 3] = ["management", "weblogic", "latest"];

/// Header the management API requires on every modifying request.
const REQUESTED_BY: &str = "dsprov";

/// Opens [`RestClient`] sessions.
#[derive(Debug, Default, Clone)]
pub struct RestConnector;

impl RestConnector {
    /// Create a connector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Connector for RestConnector {
    fn connect(
        &self,
        endpoint: &Endpoint,
        credentials: &Credentials,
    ) -> Result<Box<dyn ConfigurationClient>> {
        let client = RestClient::new(endpoint, credentials)?;
        client.verify(endpoint)?;
        Ok(Box::new(client))
    }
}

/// One authenticated session against the REST management API.
pub struct RestClient {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// API root, e.g. `http://localhost:7001/management/weblogic/latest`.
    api: Url,
    /// `Authorization` header value.
    authorization: SecretString,
}

impl RestClient {
    /// Create a client; does not contact the server.
    pub fn new(endpoint: &Endpoint, credentials: &Credentials) -> Result<Self> {
        let mut api = endpoint.http_root().clone();
        api.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint(endpoint.to_string()))?
            .pop_if_empty()
            .extend(API_ROOT);

        let token = STANDARD.encode(format!(
            "{}:{}",
            credentials.user,
            credentials.password.expose_secret()
        ));

        let agent: ureq::Agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Ok(Self {
            agent,
            api,
            authorization: SecretString::from(format!("Basic {token}")),
        })
    }

    /// Check that the server answers and accepts the credentials.
    fn verify(&self, endpoint: &Endpoint) -> Result<()> {
        let url = self.url(&["domainConfig"])?;
        let response = self
            .agent
            .get(url.as_str())
            .query("links", "none")
            .header("Accept", "application/json")
            .header("Authorization", self.authorization.expose_secret())
            .call()
            .map_err(|e| Error::connection(endpoint, e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => Ok(()),
            401 | 403 => Err(Error::connection(endpoint, "authentication rejected")),
            status => Err(Error::connection(
                endpoint,
                format!("management API answered HTTP {status}"),
            )),
        }
    }

    /// Build an API URL from path segments (each segment is percent-encoded).
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.api.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidEndpoint(self.api.to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// Path segments of a data source in the edit tree.
    fn resource_path<'a>(resource: &'a str, nested: &[&'a str]) -> Vec<&'a str> {
        let mut path = vec!["edit", "JDBCSystemResources", resource];
        path.extend_from_slice(nested);
        path
    }

    /// GET a bean; `None` on 404.
    fn get(&self, operation: &'static str, segments: &[&str]) -> Result<Option<Value>> {
        let url = self.url(segments)?;
        debug!("GET {url}");
        let response = self
            .agent
            .get(url.as_str())
            .query("links", "none")
            .header("Accept", "application/json")
            .header("Authorization", self.authorization.expose_secret())
            .call()?;

        if response.status().as_u16() == 404 {
            return Ok(None);
        }
        let mut response = check(operation, response)?;
        let value: Value = response.body_mut().read_json()?;
        Ok(Some(value))
    }

    /// POST a JSON body (create in a collection, update a bean, or run an action).
    fn post(&self, operation: &'static str, segments: &[&str], body: &Value) -> Result<()> {
        let url = self.url(segments)?;
        debug!("POST {url}");
        let response = self
            .agent
            .post(url.as_str())
            .header("Accept", "application/json")
            .header("Authorization", self.authorization.expose_secret())
            .header("X-Requested-By", REQUESTED_BY)
            .send_json(body)?;

        check(operation, response).map(drop)
    }

    fn change_manager(&self, operation: &'static str, action: &str) -> Result<()> {
        self.post(
            operation,
            &["edit", "changeManager", action],
            &json!({}),
        )
    }
}

/// Map a non-success status to an [`Error`], pulling the server's detail message.
fn check(operation: &'static str, mut response: Response<ureq::Body>) -> Result<Response<ureq::Body>> {
    let status = response.status().as_u16();
    if (200..300).contains(&status) {
        return Ok(response);
    }

    let body = response.body_mut().read_to_string().unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("HTTP {status}"));

    Err(Error::Http {
        message: format!("{operation}: {detail}"),
        status: Some(status),
    })
}

/// Whether a failed `startEdit` means someone else holds the lock.
fn is_lock_conflict(error: &Error) -> bool {
    match error {
        Error::Http {
            status: Some(409), ..
        } => true,
        Error::Http {
            status: Some(400),
            message,
        } => message.to_ascii_lowercase().contains("lock"),
        _ => false,
    }
}

/// Target identity for a server or cluster.
fn target_identity(collection: &str, name: &str) -> Value {
    json!({ "targets": [{ "identity": [collection, name] }] })
}

impl ConfigurationClient for RestClient {
    fn lookup_resource(&self, name: &str) -> Result<Option<ResourceHandle>> {
        let found = self.get(
            "lookupResource",
            &["domainConfig", "JDBCSystemResources", name],
        )?;
        Ok(found.map(|_| ResourceHandle::new(name)))
    }

    fn lookup_server(&self, name: &str) -> Result<Option<ServerHandle>> {
        let found = self.get("lookupServer", &["edit", "servers", name])?;
        Ok(found.map(|_| ServerHandle::new(name)))
    }

    // Passed through; the server encrypts it when it is stored.
    fn encrypt(&self, plaintext: &SecretString) -> Result<EncryptedCredential> {
        Ok(EncryptedCredential::new(plaintext.expose_secret()))
    }

    fn start_edit(&self) -> Result<()> {
        self.change_manager("startEdit", "startEdit")
            .map_err(|error| {
                if is_lock_conflict(&error) {
                    Error::EditLockUnavailable(error.to_string())
                } else {
                    error
                }
            })
    }

    fn save(&self) -> Result<()> {
        debug!("REST edits are persisted per request; nothing to save");
        Ok(())
    }

    fn activate(&self) -> Result<()> {
        self.change_manager("activate", "activate")
    }

    fn cancel_edit(&self) -> Result<()> {
        self.change_manager("cancelEdit", "cancelEdit")
    }

    fn create_resource(&self, name: &str) -> Result<ResourceHandle> {
        self.post(
            "createResource",
            &["edit", "JDBCSystemResources"],
            &json!({ "name": name }),
        )?;
        Ok(ResourceHandle::new(name))
    }

    fn set_descriptor_name(&self, resource: &ResourceHandle, name: &str) -> Result<()> {
        self.post(
            "setDescriptorName",
            &Self::resource_path(resource.name(), &["JDBCResource"]),
            &json!({ "name": name }),
        )
    }

    fn set_jndi_names(&self, resource: &ResourceHandle, names: &[String]) -> Result<()> {
        self.post(
            "setJndiNames",
            &Self::resource_path(resource.name(), &["JDBCResource", "JDBCDataSourceParams"]),
            &json!({ "JNDINames": names }),
        )
    }

    fn set_driver_settings(
        &self,
        resource: &ResourceHandle,
        settings: &DriverSettings,
    ) -> Result<()> {
        self.post(
            "setDriverSettings",
            &Self::resource_path(resource.name(), &["JDBCResource", "JDBCDriverParams"]),
            &json!({ "driverName": settings.driver_class, "url": settings.url }),
        )
    }

    fn set_encrypted_password(
        &self,
        resource: &ResourceHandle,
        credential: &EncryptedCredential,
    ) -> Result<()> {
        self.post(
            "setEncryptedPassword",
            &Self::resource_path(resource.name(), &["JDBCResource", "JDBCDriverParams"]),
            &json!({ "password": credential.expose() }),
        )
    }

    fn lookup_driver_property(
        &self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<Option<PropertyHandle>> {
        let found = self.get(
            "lookupDriverProperty",
            &Self::resource_path(
                resource.name(),
                &["JDBCResource", "JDBCDriverParams", "properties", "properties", name],
            ),
        )?;
        Ok(found.map(|_| PropertyHandle::new(resource.name(), name)))
    }

    fn create_driver_property(
        &self,
        resource: &ResourceHandle,
        name: &str,
    ) -> Result<PropertyHandle> {
        self.post(
            "createDriverProperty",
            &Self::resource_path(
                resource.name(),
                &["JDBCResource", "JDBCDriverParams", "properties", "properties"],
            ),
            &json!({ "name": name }),
        )?;
        Ok(PropertyHandle::new(resource.name(), name))
    }

    fn set_property_value(&self, property: &PropertyHandle, value: &str) -> Result<()> {
        self.post(
            "setPropertyValue",
            &Self::resource_path(
                property.resource(),
                &[
                    "JDBCResource",
                    "JDBCDriverParams",
                    "properties",
                    "properties",
                    property.name(),
                ],
            ),
            &json!({ "value": value }),
        )
    }

    fn set_pool_settings(&self, resource: &ResourceHandle, settings: &PoolSettings) -> Result<()> {
        self.post(
            "setPoolSettings",
            &Self::resource_path(resource.name(), &["JDBCResource", "JDBCConnectionPoolParams"]),
            &json!({
                "testConnectionsOnReserve": settings.test_connections_on_reserve,
                "testTableName": settings.test_table_name,
            }),
        )
    }

    fn add_target(&self, resource: &ResourceHandle, server: &ServerHandle) -> Result<()> {
        self.post(
            "addTarget",
            &Self::resource_path(resource.name(), &[]),
            &target_identity("servers", server.name()),
        )
    }

    fn assign_target_by_name(&self, resource_name: &str, target_name: &str) -> Result<()> {
        let collection = if self
            .get("assign", &["edit", "clusters", target_name])?
            .is_some()
        {
            "clusters"
        } else if self
            .get("assign", &["edit", "servers", target_name])?
            .is_some()
        {
            "servers"
        } else {
            return Err(Error::not_found("target", target_name));
        };

        self.post(
            "assign",
            &Self::resource_path(resource_name, &[]),
            &target_identity(collection, target_name),
        )
    }

    fn disconnect(&self) -> Result<()> {
        debug!("REST sessions are stateless; nothing to disconnect");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(url: &str) -> RestClient {
        let endpoint = Endpoint::parse(url).unwrap();
        RestClient::new(&endpoint, &Credentials::new("weblogic", "welcome1")).unwrap()
    }

    #[test]
    fn test_api_root_from_t3_endpoint() {
        let client = client("t3://localhost:7001");
        assert_eq!(
            client.api.as_str(),
            "http://localhost:7001/management/weblogic/latest"
        );
    }

    #[test]
    fn test_url_encodes_names() {
        let client = client("https://admin.example.com:7002");
        let url = client
            .url(&["edit", "JDBCSystemResources", "Car Booking DS"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://admin.example.com:7002/management/weblogic/latest/edit/JDBCSystemResources/Car%20Booking%20DS"
        );
    }

    #[test]
    fn test_basic_authorization_header() {
        let client = client("t3://localhost:7001");
        assert_eq!(
            client.authorization.expose_secret(),
            "Basic d2VibG9naWM6d2VsY29tZTE="
        );
    }

    #[test]
    fn test_encrypt_passes_secret_through_for_server_side_encryption() {
        let client = client("t3://localhost:7001");
        let credential = client
            .encrypt(&SecretString::from("app-secret".to_string()))
            .unwrap();
        assert_eq!(credential.expose(), "app-secret");
        assert_eq!(format!("{credential:?}"), "EncryptedCredential([REDACTED])");
    }

    #[test]
    fn test_resource_path() {
        let path = RestClient::resource_path("DS", &["JDBCResource", "JDBCDriverParams"]);
        assert_eq!(
            path,
            vec!["edit", "JDBCSystemResources", "DS", "JDBCResource", "JDBCDriverParams"]
        );
    }

    #[test]
    fn test_lock_conflict_detection() {
        let conflict = Error::Http {
            message: "startEdit: conflict".into(),
            status: Some(409),
        };
        assert!(is_lock_conflict(&conflict));

        let locked = Error::Http {
            message: "startEdit: Another user has the edit Lock".into(),
            status: Some(400),
        };
        assert!(is_lock_conflict(&locked));

        let other = Error::Http {
            message: "startEdit: bad request".into(),
            status: Some(400),
        };
        assert!(!is_lock_conflict(&other));
    }

    #[test]
    fn test_target_identity_shape() {
        let value = target_identity("clusters", "cluster-1");
        assert_eq!(value["targets"][0]["identity"][0], "clusters");
        assert_eq!(value["targets"][0]["identity"][1], "cluster-1");
    }
}
