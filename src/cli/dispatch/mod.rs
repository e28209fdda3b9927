//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::auth;
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Box::new(Args {
        port,
        dsn,
        frontend_url: auth_opts.frontend_url,
        master_access_code: auth_opts.master_access_code,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        access_grant_ttl_seconds: auth_opts.access_grant_ttl_seconds,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_builds_server_action() {
        temp_env::with_vars(
            [
                ("BEANLEDGER_MASTER_ACCESS_CODE", Some("s3cure-c0de")),
                (
                    "BEANLEDGER_DSN",
                    Some("postgres://user@localhost:5432/beanledger"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["beanledger"]);
                let action = handler(&matches).expect("action");
                let Action::Server(args) = action;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/beanledger");
                assert_eq!(args.frontend_url, "http://localhost:3000");
                assert!(args.master_access_code.is_some());
                assert_eq!(args.session_ttl_seconds, 604_800);
                assert_eq!(args.access_grant_ttl_seconds, 86_400);
            },
        );
    }

    #[test]
    fn handler_requires_dsn() {
        temp_env::with_vars([("BEANLEDGER_DSN", None::<&str>)], || {
            let command = crate::cli::commands::new();
            let result = command.try_get_matches_from(vec!["beanledger"]);
            assert!(result.is_err());
        });
    }
}
