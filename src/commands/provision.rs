use std::io::Write;

use domainkit::backend::Connector;
use domainkit::{
    Credentials, Endpoint, Error, ProvisionOutcome, ProvisionProgress, ResourceSpec,
    TargetBinding, TargetPath,
};

use crate::Context;
use crate::cli::{Cli, Invocation, USAGE};
use crate::config::{self, ProvisionConfig, Request};
use crate::ui;

pub const EXIT_OK: u8 = 0;
pub const EXIT_FAILED: u8 = 1;

/// Act on a parsed command line and return the exit code.
///
/// Usage text, and the reason it is shown, go to `out`.
pub fn dispatch<C: Connector>(
    ctx: &Context,
    invocation: &Invocation,
    connector: C,
    out: &mut dyn Write,
) -> u8 {
    match invocation {
        Invocation::Help => {
            ui::usage(out, None, USAGE);
            EXIT_FAILED
        }
        Invocation::Run(cli) => run(ctx, cli, connector, out),
    }
}

/// Provision the data source described by `cli` and return the exit code.
pub fn run<C: Connector>(ctx: &Context, cli: &Cli, connector: C, out: &mut dyn Write) -> u8 {
    let file = match &cli.config {
        Some(path) => match ProvisionConfig::load(path) {
            Ok(file) => file,
            Err(e) => {
                ui::error(&format!("{e:#}"));
                return EXIT_FAILED;
            }
        },
        None => ProvisionConfig::default(),
    };

    let request = match config::resolve(cli, &file) {
        Ok(request) => request,
        Err(missing) => {
            ui::usage(out, Some(&missing.to_string()), USAGE);
            return EXIT_FAILED;
        }
    };

    let endpoint = match Endpoint::parse(&request.admin_url) {
        Ok(endpoint) => endpoint,
        Err(error) => return report(ProvisionOutcome::Failed { error }),
    };

    let admin = Credentials::new(request.user.as_str(), request.password.as_str());
    let spec = resource_spec(&request);
    let mut progress = ConsoleProgress {
        quiet: ctx.quiet,
        verbose: ctx.verbose,
    };

    let outcome = domainkit::provision(connector, &endpoint, &admin, &spec, &mut progress);
    report(outcome)
}

fn resource_spec(request: &Request) -> ResourceSpec {
    let mut spec = ResourceSpec::new(
        request.ds_name.as_str(),
        request.jndi_name.as_str(),
        request.driver.as_str(),
        request.url.as_str(),
        request.target.as_str(),
    );
    if let Some(user) = &request.db_user {
        spec = spec.db_user(user.as_str());
    }
    if let Some(password) = &request.db_password {
        spec = spec.db_password(password.as_str());
    }
    spec
}

/// Print the outcome and map it to an exit code.
fn report(outcome: ProvisionOutcome) -> u8 {
    let code = if outcome.is_success() {
        EXIT_OK
    } else {
        EXIT_FAILED
    };
    match outcome {
        ProvisionOutcome::Created { binding } => ui::success(&format!(
            "Data source {} created and targeted to {} ({})",
            binding.resource,
            binding.target_name(),
            binding.path()
        )),
        ProvisionOutcome::AlreadyExists { name } => {
            ui::success(&format!("{name} already exists. Nothing to do."));
        }
        ProvisionOutcome::Failed { error } => {
            ui::error(&format!("Provisioning failed: {error}"));
            let category = error.category();
            ui::dim_err(category.description());
            ui::dim_err(category.advice());
        }
    }
    code
}

/// Operator-facing progress lines.
struct ConsoleProgress {
    quiet: bool,
    verbose: u8,
}

impl ProvisionProgress for ConsoleProgress {
    fn on_connect(&mut self, endpoint: &Endpoint) {
        if !self.quiet {
            ui::info(&format!("Connecting to {endpoint}"));
        }
    }

    // Reported once the session is closed, with the outcome.
    fn on_already_exists(&mut self, _name: &str) {}

    fn on_create(&mut self, name: &str) {
        if !self.quiet {
            ui::info(&format!("Creating data source {name}"));
        }
    }

    fn on_target(&mut self, binding: &TargetBinding) {
        if self.quiet {
            return;
        }
        ui::info(&format!(
            "Targeting {} to {}",
            binding.resource,
            binding.target_name()
        ));
        if binding.path() == TargetPath::NameFallback {
            ui::warn(&format!(
                "Server {} not found, using name-based assignment fallback",
                binding.target_name()
            ));
        }
        if self.verbose > 0 {
            ui::dim(&format!("target path: {}", binding.path()));
        }
    }

    fn on_rollback(&mut self, _error: &Error) {
        ui::warn("Error occurred; attempting to undo edits");
    }
}
