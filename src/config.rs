//! Provisioning settings: command line, optional TOML file, built-in defaults.
//!
//! Each setting is taken from the command line if given, else from the
//! `--config` file, else from the defaults below. Passwords only come from
//! the command line.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::cli::Cli;

pub const DEFAULT_DS_NAME: &str = "CarBookingDS";
pub const DEFAULT_JNDI_NAME: &str = "jdbc/CarBookingDS";
pub const DEFAULT_DRIVER: &str = "org.apache.derby.jdbc.EmbeddedDriver";
pub const DEFAULT_URL: &str = "jdbc:derby:milesofsmiles;create=true";
pub const DEFAULT_TARGET: &str = "AdminServer";

/// Settings read from a `--config` TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProvisionConfig {
    pub admin_url: Option<String>,
    pub user: Option<String>,
    pub ds_name: Option<String>,
    pub jndi_name: Option<String>,
    pub driver: Option<String>,
    pub url: Option<String>,
    pub target: Option<String>,
    pub db_user: Option<String>,
}

impl ProvisionConfig {
    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// A complete provisioning request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub admin_url: String,
    pub user: String,
    pub password: String,
    pub ds_name: String,
    pub jndi_name: String,
    pub driver: String,
    pub url: String,
    pub target: String,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
}

/// Required settings that were absent or empty, in flag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArgs(pub Vec<&'static str>);

impl fmt::Display for MissingArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing required args: {}", self.0.join(", "))
    }
}

impl std::error::Error for MissingArgs {}

/// Merge command line and file settings into a request.
///
/// An empty value counts as absent, on either layer.
pub fn resolve(cli: &Cli, file: &ProvisionConfig) -> std::result::Result<Request, MissingArgs> {
    let pick = |flag: &Option<String>, key: &Option<String>| {
        present(flag).or_else(|| present(key))
    };

    let admin_url = pick(&cli.admin_url, &file.admin_url);
    let user = pick(&cli.user, &file.user);
    let password = present(&cli.password);

    let missing: Vec<&'static str> = [
        ("adminUrl", admin_url.is_none()),
        ("user", user.is_none()),
        ("password", password.is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();

    let (Some(admin_url), Some(user), Some(password)) = (admin_url, user, password) else {
        return Err(MissingArgs(missing));
    };

    Ok(Request {
        admin_url,
        user,
        password,
        ds_name: pick(&cli.ds_name, &file.ds_name).unwrap_or_else(|| DEFAULT_DS_NAME.into()),
        jndi_name: pick(&cli.jndi_name, &file.jndi_name)
            .unwrap_or_else(|| DEFAULT_JNDI_NAME.into()),
        driver: pick(&cli.driver, &file.driver).unwrap_or_else(|| DEFAULT_DRIVER.into()),
        url: pick(&cli.url, &file.url).unwrap_or_else(|| DEFAULT_URL.into()),
        target: pick(&cli.target, &file.target).unwrap_or_else(|| DEFAULT_TARGET.into()),
        db_user: pick(&cli.db_user, &file.db_user),
        db_password: present(&cli.db_password),
    })
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref().filter(|v| !v.is_empty()).map(str::to_string)
}
