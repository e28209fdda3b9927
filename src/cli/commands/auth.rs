use anyhow::{Context, Result};
use clap::{Arg, Command};
use secrecy::SecretString;

pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_MASTER_ACCESS_CODE: &str = "master-access-code";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_ACCESS_GRANT_TTL_SECONDS: &str = "access-grant-ttl-seconds";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend base URL; drives CORS and cookie Secure flags")
                .env("BEANLEDGER_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
        .arg(
            Arg::new(ARG_MASTER_ACCESS_CODE)
                .long(ARG_MASTER_ACCESS_CODE)
                .help("Master access code for dashboard step-up verification")
                .env("BEANLEDGER_MASTER_ACCESS_CODE"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session cookie TTL in seconds")
                .env("BEANLEDGER_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_ACCESS_GRANT_TTL_SECONDS)
                .long(ARG_ACCESS_GRANT_TTL_SECONDS)
                .help("Step-up access grant cookie TTL in seconds")
                .env("BEANLEDGER_ACCESS_GRANT_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub frontend_url: String,
    pub master_access_code: Option<SecretString>,
    pub session_ttl_seconds: i64,
    pub access_grant_ttl_seconds: i64,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a defaulted argument is missing, which only
    /// happens when the `Command` wiring is broken.
    pub fn parse(matches: &clap::ArgMatches) -> Result<Self> {
        let frontend_url = matches
            .get_one::<String>(ARG_FRONTEND_URL)
            .cloned()
            .context("missing required argument: --frontend-url")?;
        let master_access_code = matches
            .get_one::<String>(ARG_MASTER_ACCESS_CODE)
            .cloned()
            .map(SecretString::from);
        let session_ttl_seconds = matches
            .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
            .copied()
            .context("missing required argument: --session-ttl-seconds")?;
        let access_grant_ttl_seconds = matches
            .get_one::<i64>(ARG_ACCESS_GRANT_TTL_SECONDS)
            .copied()
            .context("missing required argument: --access-grant-ttl-seconds")?;

        Ok(Self {
            frontend_url,
            master_access_code,
            session_ttl_seconds,
            access_grant_ttl_seconds,
        })
    }
}
