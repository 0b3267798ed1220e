//! SQLite-backed store for networks and clients.
//!
//! Every mutation runs in its own transaction and is checked to have touched
//! exactly one row, so a silent upsert or a dangling delete surfaces as an
//! error instead of corrupting state. Foreign keys are enforced: removing a
//! network cascades to its clients, and inserting a client for an unknown
//! network fails.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::{Result, StorageError};
use crate::model::{Client, Network};

use dwgd_wireguard::PublicKey;

/// Migration files embedded at build time, applied in name order.
///
/// The slice must stay lexicographically sorted; migrations run once each
/// and their names are recorded in the `migrations` ledger table.
const MIGRATIONS: &[(&str, &str)] = &[(
    "0001_initial.sql",
    include_str!("../migrations/0001_initial.sql"),
)];

/// Path value selecting an in-memory database.
pub const IN_MEMORY: &str = ":memory:";

/// Handle to the dwgd state database.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Opens (and creates, if missing) the database at `path` and applies
    /// pending migrations. `":memory:"` opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a migration
    /// fails to apply.
    pub async fn open(path: &str) -> Result<Self> {
        let options = if path == IN_MEMORY {
            SqliteConnectOptions::from_str(IN_MEMORY)?
        } else {
            SqliteConnectOptions::new().filename(path).create_if_missing(true)
        }
        .foreign_keys(true);

        // A single connection both serializes writers (SQLite allows only
        // one anyway) and keeps `:memory:` databases from fragmenting
        // across pool connections. Recycling is disabled for the same
        // reason: replacing the connection would drop an in-memory store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let storage = Self { pool };
        storage.migrate().await?;
        info!(path = %path, "state database open");
        Ok(storage)
    }

    /// Closes the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query("CREATE TABLE IF NOT EXISTS migrations (name TEXT PRIMARY KEY)")
            .execute(&self.pool)
            .await?;

        for (name, sql) in MIGRATIONS {
            let mut tx = self.pool.begin().await?;

            let seen: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM migrations WHERE name = ?")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            if seen != 0 {
                continue;
            }

            sqlx::raw_sql(sql)
                .execute(&mut *tx)
                .await
                .map_err(|source| StorageError::Migration {
                    name: (*name).to_string(),
                    source,
                })?;
            sqlx::query("INSERT INTO migrations (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            debug!(name = %name, "applied migration");
        }

        Ok(())
    }

    /// Inserts a network record.
    pub async fn add_network(&self, network: &Network) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO network (id, endpoint, seed, pubkey, route, ifname)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&network.id)
        .bind(network.endpoint.to_string())
        .bind(network.seed.as_slice())
        .bind(network.pubkey.as_bytes().as_slice())
        .bind(&network.route)
        .bind(&network.ifname)
        .execute(&mut *tx)
        .await?;

        expect_one_row(result.rows_affected())?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a network record, cascading to its clients.
    pub async fn remove_network(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM network WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        expect_one_row(result.rows_affected())?;
        tx.commit().await?;
        Ok(())
    }

    /// Fetches a network by ID, `None` when absent.
    pub async fn get_network(&self, id: &str) -> Result<Option<Network>> {
        let row: Option<(String, String, Vec<u8>, Vec<u8>, String, String)> = sqlx::query_as(
            "SELECT id, endpoint, seed, pubkey, route, ifname FROM network WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id, endpoint, seed, pubkey, route, ifname)| {
            Ok(Network {
                id,
                endpoint: parse_endpoint(&endpoint)?,
                seed,
                pubkey: parse_pubkey(&pubkey)?,
                route,
                ifname,
            })
        })
        .transpose()
    }

    /// Inserts a client record.
    ///
    /// # Errors
    ///
    /// Surfaces the foreign-key violation when `client.network` does not
    /// exist in the store.
    pub async fn add_client(&self, client: &Client) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO client (id, network_id, ip, ifname) VALUES (?, ?, ?, ?)",
        )
        .bind(&client.id)
        .bind(&client.network.id)
        .bind(client.ip.to_string())
        .bind(&client.ifname)
        .execute(&mut *tx)
        .await?;

        expect_one_row(result.rows_affected())?;
        tx.commit().await?;
        Ok(())
    }

    /// Deletes a client record.
    pub async fn remove_client(&self, id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM client WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        expect_one_row(result.rows_affected())?;
        tx.commit().await?;
        Ok(())
    }

    /// Fetches a client by ID with its network hydrated, `None` when absent.
    pub async fn get_client(&self, id: &str) -> Result<Option<Client>> {
        type ClientRow = (
            String,
            String,
            String,
            String,
            String,
            Vec<u8>,
            Vec<u8>,
            String,
            String,
        );

        let row: Option<ClientRow> = sqlx::query_as(
            "SELECT
                 client.id,
                 client.network_id,
                 client.ip,
                 client.ifname,
                 network.endpoint,
                 network.seed,
                 network.pubkey,
                 network.route,
                 network.ifname
             FROM client
             INNER JOIN network ON client.network_id = network.id
             WHERE client.id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(
            |(id, network_id, ip, ifname, endpoint, seed, pubkey, route, net_ifname)| {
                Ok(Client {
                    id,
                    ip: ip
                        .parse()
                        .map_err(|_| StorageError::CorruptRecord(format!("client ip {ip}")))?,
                    ifname,
                    network: Network {
                        id: network_id,
                        endpoint: parse_endpoint(&endpoint)?,
                        seed,
                        pubkey: parse_pubkey(&pubkey)?,
                        route,
                        ifname: net_ifname,
                    },
                })
            },
        )
        .transpose()
    }
}

fn expect_one_row(actual: u64) -> Result<()> {
    if actual == 1 {
        Ok(())
    } else {
        Err(StorageError::RowCount { actual })
    }
}

fn parse_endpoint(s: &str) -> Result<std::net::SocketAddr> {
    s.parse()
        .map_err(|_| StorageError::CorruptRecord(format!("network endpoint {s}")))
}

fn parse_pubkey(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_bytes(bytes)
        .map_err(|e| StorageError::CorruptRecord(format!("network pubkey: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::{client_fixture, network_fixture};

    async fn open_store() -> Storage {
        Storage::open(IN_MEMORY).await.expect("open")
    }

    #[tokio::test]
    async fn open_and_close() {
        let storage = open_store().await;
        storage.close().await;
    }

    #[tokio::test]
    async fn migrations_are_recorded_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("dwgd.db");
        let path = path.to_str().expect("utf8 path");

        let storage = Storage::open(path).await.expect("first open");
        storage.close().await;

        // Second open must skip the recorded migration instead of failing
        // on the already-existing tables.
        let storage = Storage::open(path).await.expect("second open");
        storage.close().await;
    }

    #[tokio::test]
    async fn network_roundtrip() {
        let storage = open_store().await;
        let network = network_fixture();

        storage.add_network(&network).await.expect("add");
        let other = storage.get_network(&network.id).await.expect("get");
        assert_eq!(other, Some(network));
    }

    #[tokio::test]
    async fn duplicate_network_fails() {
        let storage = open_store().await;
        let network = network_fixture();

        storage.add_network(&network).await.expect("add");
        let err = storage.add_network(&network).await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"), "{err}");
    }

    #[tokio::test]
    async fn remove_network_deletes_record() {
        let storage = open_store().await;
        let network = network_fixture();

        storage.add_network(&network).await.expect("add");
        storage.remove_network(&network.id).await.expect("remove");

        let other = storage.get_network(&network.id).await.expect("get");
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn remove_missing_network_reports_row_count() {
        let storage = open_store().await;
        let err = storage.remove_network("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::RowCount { actual: 0 }));
    }

    #[tokio::test]
    async fn client_requires_existing_network() {
        let storage = open_store().await;
        let client = client_fixture(network_fixture());

        let err = storage.add_client(&client).await.unwrap_err();
        assert!(err.to_string().contains("FOREIGN KEY constraint failed"), "{err}");
    }

    #[tokio::test]
    async fn client_roundtrip_hydrates_network() {
        let storage = open_store().await;
        let network = network_fixture();
        let client = client_fixture(network.clone());

        storage.add_network(&network).await.expect("add network");
        storage.add_client(&client).await.expect("add client");

        let other = storage.get_client(&client.id).await.expect("get");
        assert_eq!(other, Some(client));
    }

    #[tokio::test]
    async fn duplicate_client_fails() {
        let storage = open_store().await;
        let network = network_fixture();
        let client = client_fixture(network.clone());

        storage.add_network(&network).await.expect("add network");
        storage.add_client(&client).await.expect("add client");

        let err = storage.add_client(&client).await.unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"), "{err}");
    }

    #[tokio::test]
    async fn remove_client_deletes_record() {
        let storage = open_store().await;
        let network = network_fixture();
        let client = client_fixture(network.clone());

        storage.add_network(&network).await.expect("add network");
        storage.add_client(&client).await.expect("add client");
        storage.remove_client(&client.id).await.expect("remove");

        let other = storage.get_client(&client.id).await.expect("get");
        assert_eq!(other, None);
    }

    #[tokio::test]
    async fn removing_network_cascades_to_clients() {
        let storage = open_store().await;
        let network = network_fixture();
        let client = client_fixture(network.clone());

        storage.add_network(&network).await.expect("add network");
        storage.add_client(&client).await.expect("add client");

        storage.remove_network(&network.id).await.expect("remove network");

        let other = storage.get_client(&client.id).await.expect("get");
        assert_eq!(other, None);
    }
}
