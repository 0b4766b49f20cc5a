//! Admin account utility.
//!
//! Creates admin accounts directly in the database so the first organizer can
//! log in without the server's bootstrap variables.

use std::sync::Arc;

use anyhow::{Context, Error, bail};
use bracketeer::{
    auth::{AuthManager, PgAdminRepository},
    db::{Database, DatabaseConfig},
};
use pico_args::Arguments;

const HELP: &str = "\
Manage bracket server admin accounts

USAGE:
  bk_admin create --username NAME --password PASS [--db-url URL]

OPTIONS:
  --username   NAME        Admin username (3-20 letters, digits, underscores)
  --password   PASS        Password (8+ chars, upper, lower and digit)
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  -h, --help               Print help information

ENVIRONMENT:
  DATABASE_URL             PostgreSQL connection string
  PASSWORD_PEPPER          Must match the server's pepper
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }

    let command: Option<String> = pargs.subcommand()?;
    if command.as_deref() != Some("create") {
        bail!("Unknown command, expected 'create'\n\n{HELP}");
    }

    let username: String = pargs.value_from_str("--username")?;
    let password: String = pargs.value_from_str("--password")?;
    let database_url = match pargs.opt_value_from_str("--db-url")? {
        Some(url) => url,
        None => std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
    };
    let pepper = std::env::var("PASSWORD_PEPPER").context("PASSWORD_PEPPER is not set")?;

    let db = Database::new(&DatabaseConfig::with_url(database_url))
        .await
        .context("Failed to connect to database")?;
    db.run_migrations()
        .await
        .context("Failed to apply database schema")?;

    // Tokens are never issued here, so the signing secret is irrelevant
    let auth = AuthManager::new(
        Arc::new(PgAdminRepository::new(db.pool().clone())),
        pepper,
        String::new(),
    );

    let admin = auth.create_admin(&username, &password).await?;
    println!("Created admin '{}' (id {})", admin.username, admin.id);

    db.close().await;
    Ok(())
}
