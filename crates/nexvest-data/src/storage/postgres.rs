//! PostgreSQL JSONB 문서 저장소.
//!
//! 컬렉션별 문서는 `historical_document` 테이블에 `(collection, date)` 키로 저장되며,
//! 업서트는 JSONB 병합(`||`)으로 기존 필드를 보존합니다.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{collection_name, Document, DocumentStore, RangeQuery, UpsertSummary};
use crate::error::{DataError, Result};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS historical_collection (
        name        TEXT PRIMARY KEY,
        symbol      TEXT NOT NULL,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS historical_document (
        collection  TEXT NOT NULL REFERENCES historical_collection(name),
        date        DATE NOT NULL,
        doc         JSONB NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (collection, date)
    )
    "#,
];

/// PostgreSQL 문서 저장소.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// 기존 연결 풀에서 생성.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 새 연결 풀 생성.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to database...");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        info!("Database connection established");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// 테이블이 없으면 생성.
    pub async fn ensure_schema(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let exists: Option<(String,)> =
            sqlx::query_as("SELECT name FROM historical_collection WHERE name = $1")
                .bind(collection)
                .fetch_optional(&self.pool)
                .await?;
        Ok(exists.is_some())
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    #[instrument(skip(self, documents), fields(count = documents.len()))]
    async fn upsert(&self, symbol: &str, documents: Vec<Document>) -> Result<UpsertSummary> {
        let collection = collection_name(symbol);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO historical_collection (name, symbol) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING",
        )
        .bind(&collection)
        .bind(symbol.to_uppercase())
        .execute(&mut *tx)
        .await?;

        let mut summary = UpsertSummary::default();
        for doc in &documents {
            // 값이 같으면 행이 반환되지 않음
            let inserted: Option<bool> = sqlx::query_scalar(
                r#"
                INSERT INTO historical_document (collection, date, doc)
                VALUES ($1, $2, $3)
                ON CONFLICT (collection, date) DO UPDATE
                SET doc = historical_document.doc || EXCLUDED.doc,
                    updated_at = NOW()
                WHERE historical_document.doc IS DISTINCT FROM historical_document.doc || EXCLUDED.doc
                RETURNING (xmax = 0) AS inserted
                "#,
            )
            .bind(&collection)
            .bind(doc.date)
            .bind(Json(&doc.body))
            .fetch_optional(&mut *tx)
            .await?;

            match inserted {
                Some(true) => summary.upserted += 1,
                Some(false) => summary.modified += 1,
                None => {}
            }
        }

        tx.commit().await?;

        debug!(
            collection = %collection,
            upserted = summary.upserted,
            modified = summary.modified,
            "문서 업서트 완료"
        );
        Ok(summary)
    }

    async fn find(&self, symbol: &str, query: &RangeQuery) -> Result<Vec<Value>> {
        let collection = collection_name(symbol);
        if !self.collection_exists(&collection).await? {
            return Err(DataError::NotFound(symbol.to_uppercase()));
        }

        let limit = query.effective_limit().map(|l| l as i64);
        let rows: Vec<(Json<Value>,)> = sqlx::query_as(
            r#"
            SELECT doc FROM historical_document
            WHERE collection = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date ASC
            LIMIT $4
            "#,
        )
        .bind(&collection)
        .bind(query.from)
        .bind(query.to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(Json(doc),)| doc).collect())
    }

    async fn find_one(&self, symbol: &str, date: NaiveDate) -> Result<Option<Value>> {
        let collection = collection_name(symbol);
        if !self.collection_exists(&collection).await? {
            return Err(DataError::NotFound(symbol.to_uppercase()));
        }

        let row: Option<(Json<Value>,)> = sqlx::query_as(
            "SELECT doc FROM historical_document WHERE collection = $1 AND date = $2",
        )
        .bind(&collection)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(Json(doc),)| doc))
    }

    async fn list_symbols(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT symbol FROM historical_collection ORDER BY symbol ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(symbol,)| symbol).collect())
    }
}
