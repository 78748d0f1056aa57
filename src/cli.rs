use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::{ArgAction, Parser};

/// Usage text, printed on `-h`/`--help` and when required flags are missing.
pub const USAGE: &str = "\
Usage: dsprov --adminUrl t3://host:port --user <user> --password <pwd> [--dsName CarBookingDS] [--jndiName jdbc/CarBookingDS]
       [--driver org.apache.derby.jdbc.EmbeddedDriver] [--url jdbc:derby:/absolute/path/to/milesofsmiles;create=true] [--target AdminServer]
       [--dbUser <db user>] [--dbPassword <db password>] [--config <file.toml>] [-v...] [-q]";

/// Flags that take a value: canonical name and accepted spellings.
///
/// Each spelling is accepted with one or two leading dashes.
const VALUE_FLAGS: &[(&str, &[&str])] = &[
    ("adminUrl", &["adminUrl"]),
    ("user", &["user", "username"]),
    ("password", &["password", "pass"]),
    ("dsName", &["dsName"]),
    ("jndiName", &["jndiName"]),
    ("driver", &["driver"]),
    ("url", &["url"]),
    ("target", &["target"]),
    ("dbUser", &["dbUser"]),
    ("dbPassword", &["dbPassword"]),
    ("config", &["config"]),
];

#[derive(Parser, Debug, Default)]
#[command(name = "dsprov")]
#[command(author = "Alberto Cavalcante")]
#[command(about = "Idempotently provision a JDBC data source in an application-server domain", long_about = None)]
#[command(disable_help_flag = true)]
#[command(args_override_self = true)]
pub struct Cli {
    /// Admin server URL, e.g. t3://localhost:7001
    #[arg(long = "adminUrl")]
    pub admin_url: Option<String>,

    /// Admin user
    #[arg(long)]
    pub user: Option<String>,

    /// Admin password
    #[arg(long)]
    pub password: Option<String>,

    /// Data source name
    #[arg(long = "dsName")]
    pub ds_name: Option<String>,

    /// JNDI name
    #[arg(long = "jndiName")]
    pub jndi_name: Option<String>,

    /// JDBC driver class
    #[arg(long)]
    pub driver: Option<String>,

    /// JDBC connection URL
    #[arg(long)]
    pub url: Option<String>,

    /// Server or cluster to target
    #[arg(long)]
    pub target: Option<String>,

    /// Database user
    #[arg(long = "dbUser")]
    pub db_user: Option<String>,

    /// Database password (stored encrypted)
    #[arg(long = "dbPassword")]
    pub db_password: Option<String>,

    /// TOML file with defaults for any flag except passwords
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

/// What the command line asks for.
#[derive(Debug)]
pub enum Invocation {
    /// `-h`/`--help`, or a command line that could not be read.
    Help,
    /// Provision with these flags.
    Run(Cli),
}

/// Parse the process arguments (without the program name).
pub fn parse<I, S>(args: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let Some(normalized) = normalize(&args) else {
        return Invocation::Help;
    };

    match Cli::try_parse_from(std::iter::once("dsprov".to_string()).chain(normalized)) {
        Ok(cli) => Invocation::Run(cli),
        Err(e) => {
            log::debug!("{e}");
            Invocation::Help
        }
    }
}

/// Rewrite argv into canonical `--name=value` flags.
///
/// Single-dash spellings and aliases map to their canonical flag, the last
/// occurrence of a flag wins, a value flag with nothing after it unsets the
/// flag, and unknown flags or stray values are skipped. Returns `None` when
/// help was requested.
fn normalize(args: &[String]) -> Option<Vec<String>> {
    let mut values: BTreeMap<&'static str, String> = BTreeMap::new();
    let mut switches = Vec::new();

    let mut i = 0;
    while i < args.len() {
        let token = args[i].as_str();

        if let Some(flag) = value_flag(token) {
            match args.get(i + 1) {
                Some(value) => {
                    values.insert(flag, value.clone());
                }
                None => {
                    values.remove(flag);
                }
            }
            i += 2;
            continue;
        }

        match token {
            "-h" | "--help" => return None,
            "-q" | "--quiet" => switches.push("--quiet".to_string()),
            "--verbose" => switches.push("-v".to_string()),
            _ if is_verbose_cluster(token) => switches.push(token.to_string()),
            _ => log::trace!("skipping argument {token:?}"),
        }
        i += 1;
    }

    let mut normalized: Vec<String> = values
        .into_iter()
        .map(|(flag, value)| format!("--{flag}={value}"))
        .collect();
    normalized.extend(switches);
    Some(normalized)
}

/// Canonical name of a value flag spelled `-name` or `--name`.
fn value_flag(token: &str) -> Option<&'static str> {
    let name = token
        .strip_prefix("--")
        .or_else(|| token.strip_prefix('-'))?;
    VALUE_FLAGS
        .iter()
        .find(|(_, spellings)| spellings.contains(&name))
        .map(|(canonical, _)| *canonical)
}

/// `-v`, `-vv`, `-vvv`, ...
fn is_verbose_cluster(token: &str) -> bool {
    token
        .strip_prefix('-')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c == 'v'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(args: &[&str]) -> Cli {
        match parse(args.iter().copied()) {
            Invocation::Run(cli) => cli,
            Invocation::Help => panic!("expected a run invocation for {args:?}"),
        }
    }

    #[test]
    fn test_parse_double_dash_flags() {
        let cli = run(&[
            "--adminUrl",
            "t3://localhost:7001",
            "--user",
            "weblogic",
            "--password",
            "welcome1",
            "--dsName",
            "OrdersDS",
            "--target",
            "ms1",
        ]);
        assert_eq!(cli.admin_url.as_deref(), Some("t3://localhost:7001"));
        assert_eq!(cli.user.as_deref(), Some("weblogic"));
        assert_eq!(cli.password.as_deref(), Some("welcome1"));
        assert_eq!(cli.ds_name.as_deref(), Some("OrdersDS"));
        assert_eq!(cli.target.as_deref(), Some("ms1"));
        assert!(cli.jndi_name.is_none());
    }

    #[test]
    fn test_parse_single_dash_and_aliases() {
        let cli = run(&[
            "-adminUrl",
            "t3://localhost:7001",
            "-username",
            "weblogic",
            "--pass",
            "welcome1",
            "-dbUser",
            "app",
        ]);
        assert_eq!(cli.admin_url.as_deref(), Some("t3://localhost:7001"));
        assert_eq!(cli.user.as_deref(), Some("weblogic"));
        assert_eq!(cli.password.as_deref(), Some("welcome1"));
        assert_eq!(cli.db_user.as_deref(), Some("app"));
    }

    #[test]
    fn test_unknown_flags_and_stray_values_are_skipped() {
        let cli = run(&[
            "stray",
            "--colour",
            "--user",
            "weblogic",
            "--force",
            "--password",
            "welcome1",
        ]);
        assert_eq!(cli.user.as_deref(), Some("weblogic"));
        assert_eq!(cli.password.as_deref(), Some("welcome1"));
    }

    #[test]
    fn test_values_may_start_with_a_dash() {
        let cli = run(&["--password", "-secret-", "--dbPassword", "--tricky"]);
        assert_eq!(cli.password.as_deref(), Some("-secret-"));
        assert_eq!(cli.db_password.as_deref(), Some("--tricky"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let cli = run(&["--user", "first", "-user", "second"]);
        assert_eq!(cli.user.as_deref(), Some("second"));
    }

    #[test]
    fn test_trailing_flag_without_value_unsets() {
        let cli = run(&["--dbUser", "app", "--dbUser"]);
        assert!(cli.db_user.is_none());
    }

    #[test]
    fn test_help_flags() {
        assert!(matches!(parse(["-h"]), Invocation::Help));
        assert!(matches!(
            parse(["--user", "weblogic", "--help"]),
            Invocation::Help
        ));
    }

    #[test]
    fn test_verbosity_and_quiet() {
        let cli = run(&["-vv", "--verbose", "-q"]);
        assert_eq!(cli.verbose, 3);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_path() {
        let cli = run(&["-config", "/etc/dsprov.toml"]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/dsprov.toml")));
    }

    #[test]
    fn test_value_flag_spellings() {
        assert_eq!(value_flag("--adminUrl"), Some("adminUrl"));
        assert_eq!(value_flag("-pass"), Some("password"));
        assert_eq!(value_flag("adminUrl"), None);
        assert_eq!(value_flag("---user"), None);
    }
}
