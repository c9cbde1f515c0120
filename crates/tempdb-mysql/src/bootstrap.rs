//! Creation of the fixed database and account inside a fresh server.

use sqlx::{Executor, MySqlConnection};
use tracing::debug;

use tempdb_core::{LaunchError, ServiceEndpoint};

/// Statements that make `endpoint`'s identity usable over TCP.
///
/// Every statement is idempotent so a reused data directory bootstraps
/// cleanly. The anonymous localhost account some initializers create would
/// otherwise shadow the fixed user.
pub fn identity_statements(endpoint: &ServiceEndpoint) -> Vec<String> {
    let user = quote_literal(&endpoint.username);
    let password = quote_literal(&endpoint.password);
    let mut statements = vec![
        format!(
            "CREATE DATABASE IF NOT EXISTS {}",
            quote_ident(&endpoint.database)
        ),
        "DROP USER IF EXISTS ''@'localhost'".to_string(),
    ];
    for host in ["%", "localhost"] {
        statements.push(format!(
            "CREATE USER IF NOT EXISTS {user}@'{host}' IDENTIFIED BY {password}"
        ));
        statements.push(format!("GRANT ALL PRIVILEGES ON *.* TO {user}@'{host}'"));
    }
    statements.push("FLUSH PRIVILEGES".to_string());
    statements
}

/// Run the identity statements over an administrative connection.
pub async fn create_identity(
    conn: &mut MySqlConnection,
    endpoint: &ServiceEndpoint,
) -> Result<(), LaunchError> {
    for statement in identity_statements(endpoint) {
        // Account management is not preparable everywhere; use the text protocol
        conn.execute(sqlx::raw_sql(&statement))
            .await
            .map_err(|e| LaunchError::Bootstrap(format!("{statement}: {e}")))?;
    }
    debug!(user = %endpoint.username, database = %endpoint.database, "Created fixed identity");
    Ok(())
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

fn quote_ident(value: &str) -> String {
    format!("`{}`", value.replace('`', "``"))
}
