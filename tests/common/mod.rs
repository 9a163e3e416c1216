//! Shared setup for store-backed tests: one throwaway schema per test.
//!
//! Tests need `DATABASE_URL` pointing at a PostgreSQL 13+ server and are skipped without it.

#![allow(dead_code)]

use generic_data_api::{load_catalog, Catalog};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::atomic::{AtomicU32, Ordering};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Schema name unique to this process and test: `test_{pid}_{n}`.
fn isolated_schema() -> String {
    format!(
        "test_{}_{}",
        std::process::id(),
        TEST_COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

pub struct TestDb {
    pub pool: PgPool,
    pub schema: String,
    pub catalog: Catalog,
}

impl TestDb {
    /// Library fixture: books (soft delete) <-> authors through books_authors, books -> reviews.
    /// Returns `None` when no database is configured.
    pub async fn library() -> Option<TestDb> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return None;
        };
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        let schema = isolated_schema();
        sqlx::raw_sql(&library_ddl(&schema))
            .execute(&pool)
            .await
            .expect("create fixture schema");
        let catalog = load_catalog(&pool, &schema, false).await.expect("load catalog");
        Some(TestDb { pool, schema, catalog })
    }

    pub async fn reload(&mut self) {
        self.catalog = load_catalog(&self.pool, &self.schema, false)
            .await
            .expect("reload catalog");
    }

    pub fn table(&self, name: &str) -> String {
        format!("\"{}\".\"{}\"", self.schema, name)
    }

    pub async fn count(&self, sql_from_where: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", sql_from_where))
            .fetch_one(&self.pool)
            .await
            .expect("count")
    }

    pub async fn teardown(self) {
        sqlx::raw_sql(&format!("DROP SCHEMA \"{}\" CASCADE", self.schema))
            .execute(&self.pool)
            .await
            .ok();
        self.pool.close().await;
    }
}

fn library_ddl(schema: &str) -> String {
    let s = format!("\"{}\"", schema);
    format!(
        r#"
        CREATE SCHEMA {s};
        CREATE TABLE {s}.relationships (
            id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
            primary_table_name text NOT NULL,
            secondary_table_name text NOT NULL,
            associative_table_name text,
            primary_table_alias text,
            created_at timestamptz NOT NULL DEFAULT now(),
            updated_at timestamptz NOT NULL DEFAULT now(),
            deleted_at timestamptz
        );
        CREATE TABLE {s}.operations (
            id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
            table_name text NOT NULL,
            read_op boolean NOT NULL DEFAULT false,
            create_op boolean NOT NULL DEFAULT false,
            update_op boolean NOT NULL DEFAULT false,
            delete_op boolean NOT NULL DEFAULT false,
            created_at timestamptz NOT NULL DEFAULT now(),
            updated_at timestamptz NOT NULL DEFAULT now(),
            deleted_at timestamptz
        );
        CREATE TABLE {s}.books (
            id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
            title text NOT NULL,
            subtitle text,
            in_print boolean NOT NULL DEFAULT true,
            pages integer,
            price numeric(8, 2),
            published_at timestamptz,
            created_at timestamptz NOT NULL DEFAULT now(),
            updated_at timestamptz NOT NULL DEFAULT now(),
            deleted_at timestamptz
        );
        CREATE TABLE {s}.authors (
            id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
            name text NOT NULL,
            created_at timestamptz NOT NULL DEFAULT now()
        );
        CREATE TABLE {s}.books_authors (
            books_id uuid NOT NULL REFERENCES {s}.books (id),
            authors_id uuid NOT NULL REFERENCES {s}.authors (id),
            PRIMARY KEY (books_id, authors_id)
        );
        CREATE TABLE {s}.reviews (
            id uuid PRIMARY KEY DEFAULT gen_random_uuid(),
            books_id uuid REFERENCES {s}.books (id),
            body text NOT NULL,
            deleted_at timestamptz
        );
        INSERT INTO {s}.relationships (primary_table_name, secondary_table_name, associative_table_name)
        VALUES ('books', 'authors', 'books_authors'), ('books', 'reviews', NULL);
        INSERT INTO {s}.operations (table_name, read_op, create_op, update_op, delete_op)
        VALUES ('books', true, true, true, true),
               ('authors', true, true, true, true),
               ('reviews', true, true, false, false);
        "#,
        s = s
    )
}
