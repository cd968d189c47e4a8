use anyhow::{Context, Result};
use clap::Subcommand;

use tokenkeep::transport::Method;
use tokenkeep::{CredentialPair, HttpRequest, ReqwestTransport, SessionManager};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a token pair obtained from a login
    SignIn {
        #[arg(long, env = "TOKENKEEP_ACCESS_TOKEN")]
        access_token: String,
        #[arg(long, env = "TOKENKEEP_REFRESH_TOKEN")]
        refresh_token: String,
        /// Access token lifetime in seconds
        #[arg(long)]
        expires_in: Option<i64>,
        /// Expiry as epoch seconds or milliseconds
        #[arg(long)]
        expires_at: Option<i64>,
    },
    /// Show whether a session is stored and when it expires
    Status,
    /// Refresh the session if it has expired
    Refresh,
    /// Send a request through the session pipeline
    Request {
        method: String,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Send without credentials or session handling
        #[arg(long)]
        no_auth: bool,
    },
    /// End the session
    SignOut,
}

pub async fn execute(command: Command, manager: &SessionManager<ReqwestTransport>) -> Result<()> {
    match command {
        Command::SignIn {
            access_token,
            refresh_token,
            expires_in,
            expires_at,
        } => {
            let mut pair = CredentialPair::new(access_token, refresh_token);
            pair.expires_in = expires_in;
            pair.expires_at = expires_at;
            manager.sign_in(pair)?;
            println!("✓ Signed in");
            print_expiry(manager);
        }
        Command::Status => {
            if manager.current().is_none() {
                println!("Not signed in");
            } else if manager.is_authenticated() {
                println!("Signed in");
                print_expiry(manager);
            } else {
                println!("Signed in, access token expired (will refresh on next request)");
            }
        }
        Command::Refresh => match manager.ensure_fresh().await {
            Some(_) => {
                println!("✓ Session is fresh");
                print_expiry(manager);
            }
            None if manager.current().is_some() => {
                manager.terminate().await;
                anyhow::bail!("Refresh failed, session ended");
            }
            None => anyhow::bail!("Not signed in"),
        },
        Command::Request {
            method,
            path,
            data,
            no_auth,
        } => {
            let method = Method::from_bytes(method.to_uppercase().as_bytes())
                .with_context(|| format!("Invalid HTTP method: {}", method))?;
            let mut request = HttpRequest::new(method, path);
            if let Some(data) = data {
                let body = serde_json::from_str(&data).context("--data must be valid JSON")?;
                request = request.json(body);
            }
            if no_auth {
                request = request.without_auth();
            }

            let response = manager.execute(request).await?;
            println!("{}", response.status);
            println!("{}", response.text());
        }
        Command::SignOut => {
            manager.sign_out().await;
            println!("✓ Signed out");
        }
    }

    Ok(())
}

/// Run a command, then let any logout it triggered reach the server.
pub async fn run(command: Command, manager: &SessionManager<ReqwestTransport>) -> Result<()> {
    let result = execute(command, manager).await;
    manager.logout_settled().await;
    result
}

fn print_expiry(manager: &SessionManager<ReqwestTransport>) {
    match manager.expires_at() {
        Some(expires_at) => println!("Access token expires at {}", expires_at.to_rfc3339()),
        None => println!("Access token expiry unknown"),
    }
}
