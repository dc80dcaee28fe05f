use anyhow::Context;
use tokio_postgres::error::SqlState;
use tokio_postgres::{Client, NoTls};

pub struct PostgresLibraryStoreConfig {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

/// Every query goes through one connection guarded by a mutex, so a transaction
/// started by one call never interleaves with statements of another
pub struct PostgresLibraryStore {
    pub(crate) client: tokio::sync::Mutex<Client>,
}

impl PostgresLibraryStore {
    pub async fn init(config: PostgresLibraryStoreConfig) -> anyhow::Result<Self> {
        let connection_str = format!(
            "postgresql://{}:{}@{}",
            config.username, config.password, config.hostname
        );
        tracing::info!(
            "Connecting to postgres at {} as {}",
            config.hostname,
            config.username
        );
        let (client, connection) = tokio_postgres::connect(&connection_str, NoTls)
            .await
            .context("Failed to start postgres")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!("Postgres connection error: {}", e);
            }
        });

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS users (
            id              SERIAL PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            password        VARCHAR(128) NOT NULL,
            first_name      VARCHAR(20) NOT NULL,
            middle_name     VARCHAR(20),
            last_name       VARCHAR(20) NOT NULL,
            role            INTEGER NOT NULL DEFAULT 0,
            is_active       BOOLEAN NOT NULL DEFAULT FALSE,
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at      TIMESTAMPTZ NOT NULL DEFAULT now()
            )
        ",
            )
            .await
            .context("Failed to setup users table")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS authors (
            id              SERIAL PRIMARY KEY,
            name            VARCHAR(10) NOT NULL,
            surname         VARCHAR(20) NOT NULL,
            patronymic      VARCHAR(20) NOT NULL
            )
        ",
            )
            .await
            .context("Failed to setup authors table")?;

        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS books (
            id              SERIAL PRIMARY KEY,
            name            VARCHAR(128) NOT NULL,
            description     TEXT NOT NULL,
            count           INTEGER NOT NULL DEFAULT 10 CHECK (count >= 0)
            );
        CREATE TABLE IF NOT EXISTS book_authors (
            book_id         INTEGER NOT NULL REFERENCES books (id) ON DELETE CASCADE,
            author_id       INTEGER NOT NULL REFERENCES authors (id) ON DELETE CASCADE,
            PRIMARY KEY (book_id, author_id)
            )
        ",
            )
            .await
            .context("Failed to setup books tables")?;

        // No ON DELETE here, order cleanup is done explicitly by the repositories
        client
            .batch_execute(
                "
        CREATE TABLE IF NOT EXISTS orders (
            id              SERIAL PRIMARY KEY,
            user_id         INTEGER NOT NULL REFERENCES users (id),
            book_id         INTEGER NOT NULL REFERENCES books (id),
            created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
            plated_end_at   TIMESTAMPTZ NOT NULL,
            end_at          TIMESTAMPTZ
            )
        ",
            )
            .await
            .context("Failed to setup orders table")?;

        Ok(Self {
            client: tokio::sync::Mutex::new(client),
        })
    }
}

pub(crate) fn is_unique_violation(err: &tokio_postgres::Error) -> bool {
    err.as_db_error()
        .map(|db_err| db_err.code() == &SqlState::UNIQUE_VIOLATION)
        .unwrap_or_default()
}
