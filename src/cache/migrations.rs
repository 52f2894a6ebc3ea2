// Copyright (C) 2026 the project contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Cache database schema.
//!
//! Migrations are tracked in a `_migrations` table and applied as plain SQL
//! at connection time, rather than via sqlx's compile-time migration macro,
//! so the schema can evolve without a build-time database connection.

use crate::error::Result;
use sqlx::{Executor, SqlitePool};

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_migrations_table(pool).await?;
    run_migration(pool, 1, "initial_schema", create_initial_schema(pool)).await?;
    Ok(())
}

async fn create_migrations_table(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .await?;
    Ok(())
}

async fn run_migration(
    pool: &SqlitePool,
    id: i32,
    name: &str,
    migration_fn: impl std::future::Future<Output = Result<()>>,
) -> Result<()> {
    let applied: Option<i32> = sqlx::query_scalar("SELECT id FROM _migrations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    if applied.is_some() {
        return Ok(());
    }

    migration_fn.await?;

    sqlx::query("INSERT INTO _migrations (id, name) VALUES (?, ?)")
        .bind(id)
        .bind(name)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_initial_schema(pool: &SqlitePool) -> Result<()> {
    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            namespace TEXT NOT NULL,
            key TEXT NOT NULL,
            payload TEXT NOT NULL,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            external_id TEXT,
            title TEXT,
            author TEXT,
            source TEXT,
            UNIQUE(namespace, key)
        )
        "#,
    )
    .await?;

    pool.execute("CREATE INDEX IF NOT EXISTS idx_entries_ns_key ON entries(namespace, key)")
        .await?;
    pool.execute("CREATE INDEX IF NOT EXISTS idx_entries_expires ON entries(expires_at)")
        .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_external_id ON entries(external_id) WHERE external_id IS NOT NULL",
    )
    .await?;
    pool.execute(
        "CREATE INDEX IF NOT EXISTS idx_entries_source_external_id ON entries(source, external_id)",
    )
    .await?;

    pool.execute(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS entries_fts USING fts5(
            title, author, namespace, key,
            content='entries', content_rowid='id'
        )
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE TRIGGER IF NOT EXISTS entries_ai AFTER INSERT ON entries BEGIN
            INSERT INTO entries_fts(rowid, title, author, namespace, key)
            VALUES (new.id, new.title, new.author, new.namespace, new.key);
        END
        "#,
    )
    .await?;
    pool.execute(
        r#"
        CREATE TRIGGER IF NOT EXISTS entries_ad AFTER DELETE ON entries BEGIN
            INSERT INTO entries_fts(entries_fts, rowid, title, author, namespace, key)
            VALUES ('delete', old.id, old.title, old.author, old.namespace, old.key);
        END
        "#,
    )
    .await?;
    pool.execute(
        r#"
        CREATE TRIGGER IF NOT EXISTS entries_au AFTER UPDATE ON entries BEGIN
            INSERT INTO entries_fts(entries_fts, rowid, title, author, namespace, key)
            VALUES ('delete', old.id, old.title, old.author, old.namespace, old.key);
            INSERT INTO entries_fts(rowid, title, author, namespace, key)
            VALUES (new.id, new.title, new.author, new.namespace, new.key);
        END
        "#,
    )
    .await?;

    pool.execute(
        r#"
        CREATE TABLE IF NOT EXISTS mappings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            local_id TEXT UNIQUE,
            local_path TEXT,
            canonical_external_id TEXT,
            title TEXT,
            author TEXT,
            confidence REAL,
            matched_at TEXT NOT NULL
        )
        "#,
    )
    .await?;
    pool.execute("CREATE INDEX IF NOT EXISTS idx_mappings_external_id ON mappings(external_id)")
        .await?;
    pool.execute("CREATE INDEX IF NOT EXISTS idx_mappings_local_id ON mappings(local_id)")
        .await?;

    Ok(())
}
