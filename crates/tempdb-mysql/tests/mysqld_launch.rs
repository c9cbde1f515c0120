//! Launch tests against a locally installed mysqld.
//!
//! Skipped (passing) when no server binary can be found.

use anyhow::Result;
use sqlx::{Connection, Row};
use std::time::Duration;

use tempdb_core::{
    DEFAULT_DATABASE, DatabaseDriver, FIXED_USERNAME, LaunchSpec, ServerLauncher, ServiceEndpoint,
    TempDbConfig,
};
use tempdb_mysql::{MySqlDriver, MysqldLauncher, binary};
use tempdb_runtime::PortAllocator;
use tempfile::TempDir;

fn mysqld_available() -> bool {
    binary::resolve(None).is_ok()
}

#[tokio::test]
async fn test_launch_bootstraps_fixed_identity() -> Result<()> {
    if !mysqld_available() {
        eprintln!("skipping: no mysqld installed");
        return Ok(());
    }

    let dir = TempDir::new()?;
    let port = PortAllocator::from_config(&TempDbConfig::default()).pick_port()?;
    let spec = LaunchSpec::new(
        ServiceEndpoint::loopback(port, DEFAULT_DATABASE),
        dir.path().join(format!("tempdb-mysqld-{port}")),
        Duration::from_secs(120),
    );
    std::fs::create_dir_all(&spec.workdir)?;

    let mut server = MysqldLauncher::new(None).launch(&spec).await?;
    assert!(server.is_running());

    let mut conn = MySqlDriver::new().connect(&spec.endpoint).await?;
    let row = sqlx::query("SELECT CURRENT_USER(), DATABASE()")
        .fetch_one(&mut conn)
        .await?;
    let user: String = row.try_get(0)?;
    let database: String = row.try_get(1)?;
    assert!(user.starts_with(FIXED_USERNAME));
    assert_eq!(database, DEFAULT_DATABASE);
    conn.close().await?;

    server.terminate(Duration::from_secs(10))?;
    assert!(!server.is_running());
    Ok(())
}
