use crate::api;
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub frontend_url: String,
    pub master_access_code: Option<SecretString>,
    pub session_ttl_seconds: i64,
    pub access_grant_ttl_seconds: i64,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let auth_config = api::AuthConfig::new(args.frontend_url)
        .with_master_access_code(args.master_access_code)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_access_grant_ttl_seconds(args.access_grant_ttl_seconds);

    api::new(args.port, args.dsn, auth_config).await
}
