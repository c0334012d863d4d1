//! Minimal end-to-end sign-in against a running auth server.
//!
//! ```text
//! cargo run --example login_flow -- http://localhost:3000 doc@example.com 'Str0ng!pass'
//! ```

use std::sync::Arc;

use anyhow::{Context, Result};
use url::Url;

use auth_runtime::{AuthRuntime, RuntimeConfig};
use auth_storage::FileStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,auth_runtime=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let usage = "usage: login_flow <base-url> <email> <password>";
    let base = args.next().context(usage)?;
    let email = args.next().context(usage)?;
    let password = args.next().context(usage)?;

    let storage = Arc::new(FileStorage::open("./caresuite-auth.json")?);
    let runtime = AuthRuntime::new(RuntimeConfig::new(Url::parse(&base)?, storage));

    let mut updates = runtime.subscribe();
    tokio::spawn(async move {
        while let Some(state) = updates.recv().await {
            tracing::info!(
                authenticated = state.is_authenticated,
                loading = state.loading,
                error = state.error.as_deref().unwrap_or(""),
                "auth state"
            );
        }
    });

    let user = runtime.login(&email, &password).await?;
    println!(
        "signed in as {} {} ({:?})",
        user.first_name, user.last_name, user.role
    );

    for session in runtime.sessions().fetch_active_sessions() {
        println!("active session {} on {}", session.id, session.device);
    }

    runtime.logout(false).await?;
    println!("signed out");
    Ok(())
}
