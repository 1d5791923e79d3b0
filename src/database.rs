//! Database schema registry backed by SQLite.

use std::{any::type_name, collections::BTreeMap, path::Path, time::Duration};

use sqlx::{
    ConnectOptions, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use tracing::info;

use crate::{Error, Result};

/// Database file used by applications that do not pick their own.
pub const DB_FILE_NAME: &str = "data.db";

/// A table managed by [`DbSchema`].
///
/// Every table also gets `id`, `created_at` and `updated_at` columns.
pub trait DbModel: 'static {
    const TABLE: &'static str;
    /// `(name, declaration)` pairs, e.g. `("title", "TEXT NOT NULL DEFAULT ''")`.
    const COLUMNS: &'static [(&'static str, &'static str)];
}

static BASE_COLUMNS: [(&str, &str); 3] = [
    ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
    ("created_at", "TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP"),
    ("updated_at", "TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP"),
];

#[derive(Debug, Clone, Copy)]
struct ModelSchema {
    table: &'static str,
    columns: &'static [(&'static str, &'static str)],
}

impl ModelSchema {
    fn all_columns(&self) -> impl Iterator<Item = &(&'static str, &'static str)> {
        BASE_COLUMNS.iter().chain(self.columns.iter())
    }

    fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .all_columns()
            .map(|(name, decl)| format!("\"{name}\" {decl}"))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            self.table,
            columns.join(", ")
        )
    }
}

/// Collects model types and migrates them into a database.
#[derive(Debug, Default)]
pub struct DbSchema {
    models: BTreeMap<&'static str, ModelSchema>,
    pool: Option<SqlitePool>,
}

impl DbSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_model<T: DbModel>(&mut self) -> &mut Self {
        self.models.insert(
            type_name::<T>(),
            ModelSchema {
                table: T::TABLE,
                columns: T::COLUMNS,
            },
        );
        self
    }

    pub fn has_model<T: DbModel>(&self) -> bool {
        self.models.contains_key(type_name::<T>())
    }

    pub fn model_count(&self) -> usize {
        self.models.len()
    }

    /// The open pool, if [`DbSchema::open`] succeeded.
    pub fn db(&self) -> Option<&SqlitePool> {
        self.pool.as_ref()
    }

    /// Opens (creating if needed) the SQLite file at `path` and migrates every
    /// registered model: missing tables are created and missing columns added.
    pub async fn open(&mut self, path: &Path, log_sql: bool) -> Result<()> {
        let mut options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        if !log_sql {
            options = options.disable_statement_logging();
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect_with(options)
            .await?;
        info!("Database {} opened", path.display());

        for (name, model) in &self.models {
            migrate(&pool, model).await.map_err(|source| Error::Migration {
                model: (*name).to_string(),
                source,
            })?;
        }
        info!(
            "Database migration done (schema model count: {})",
            self.models.len()
        );

        self.pool = Some(pool);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(pool) = self.pool.take() {
            pool.close().await;
            info!("Database closed");
        }
    }
}

async fn migrate(pool: &SqlitePool, model: &ModelSchema) -> Result<(), sqlx::Error> {
    sqlx::query(&model.create_table_sql()).execute(pool).await?;

    let existing: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
        .bind(model.table)
        .fetch_all(pool)
        .await?;

    for (name, decl) in model.columns {
        if existing.iter().any(|column| column == name) {
            continue;
        }
        let alter = format!(
            "ALTER TABLE \"{}\" ADD COLUMN \"{name}\" {decl}",
            model.table
        );
        sqlx::query(&alter).execute(pool).await?;
        info!("Added column {}.{}", model.table, name);
    }

    Ok(())
}
