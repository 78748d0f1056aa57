//! # domainkit
//!
//! Idempotent provisioning of a data source in an application-server
//! domain, over an administrative session.
//!
//! The heart of the crate is the edit-session protocol: take the domain's
//! exclusive edit lock, stage a coordinated set of nested changes, then
//! activate them as a unit or discard them all.
//!
//! ## Components
//!
//! | Module | Role |
//! |---------------|-------------------------------------------------------|
//! | [`session`]   | Open and close the administrative session             |
//! | [`guard`]     | Existence check before any edit                       |
//! | [`transaction`] | Edit lock, commit and rollback state machine        |
//! | [`resource`]  | Create the data source and its nested parameters      |
//! | [`credential`]| Encrypt and attach optional database credentials      |
//! | [`target`]    | Bind the data source to a server, with a name fallback |
//! | [`provision`] | The whole flow, end to end                            |
//!
//! ## Example
//!
//! ```no_run
//! use domainkit::backend::rest::RestConnector;
//! use domainkit::{Credentials, Endpoint, ProvisionOutcome, ResourceSpec};
//!
//! let endpoint = Endpoint::parse("t3://localhost:7001").expect("bad admin URL");
//! let admin = Credentials::new("weblogic", "welcome1");
//! let spec = ResourceSpec::new(
//!     "CarBookingDS",
//!     "jdbc/CarBookingDS",
//!     "org.apache.derby.jdbc.EmbeddedDriver",
//!     "jdbc:derby:milesofsmiles;create=true",
//!     "AdminServer",
//! );
//!
//! match domainkit::provision_simple(RestConnector::new(), &endpoint, &admin, &spec) {
//!     Ok(ProvisionOutcome::AlreadyExists { name }) => println!("{name} already exists"),
//!     Ok(_) => println!("created"),
//!     Err(e) => eprintln!("failed: {e}"),
//! }
//! ```
//!
//! ## Backends
//!
//! - `rest` (default feature): the server's RESTful management API
//! - [`backend::MockDomain`]: an in-memory domain for tests
//!
//! ## Blocking
//!
//! Everything is synchronous. Activation waits for the servers to apply the
//! change set and has no timeout; a hung server hangs the caller.

#![warn(clippy::all)]

pub mod backend;
pub mod credential;
pub mod error;
pub mod guard;
pub mod provision;
pub mod resource;
pub mod session;
pub mod target;
pub mod transaction;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use provision::{NoProgress, ProvisionProgress, provision, provision_in_session, provision_simple};
pub use session::{AdminSession, SessionManager};
pub use transaction::EditTransaction;
pub use types::{
    Credentials, DriverSettings, EncryptedCredential, Endpoint, PoolSettings, PropertyHandle,
    ProvisionOutcome, ProvisionStep, ResourceHandle, ResourceSpec, ServerHandle, TargetBinding,
    TargetPath, TargetRef, TxState,
};
