//! Repository for the `images` catalog table.
//!
//! The `embedding` column is pgvector `vector(768)`. Embeddings are bound
//! as text (`'[0.1,0.2,...]'`) and cast in SQL; distances use the cosine
//! operator `<=>`, served by the HNSW index.
//!
//! Nearest-neighbour queries run in a transaction that raises
//! `hnsw.ef_search` to at least the requested limit and enables
//! `hnsw.iterative_scan`, so a category filter applied during the index
//! scan cannot starve the result. Both settings need pgvector 0.8+.

use retouch_core::catalog::vector_literal;
use sqlx::PgPool;

use crate::models::image::{CreateImageRecord, ImageRecord, ImageSearchHit};

/// Column list for `images` queries (excludes the `embedding` vector).
const COLUMNS: &str = "id, url, description, category, created_at";

/// Default `hnsw.ef_search`; also the floor applied to every search.
const MIN_EF_SEARCH: i64 = 40;

/// pgvector's upper bound for `hnsw.ef_search`.
const MAX_EF_SEARCH: i64 = 1000;

/// Provides catalog reads and ingestion inserts.
pub struct ImageRepo;

impl ImageRepo {
    /// Insert a record unless one with the same id exists.
    ///
    /// Returns `true` when a row was written.
    pub async fn insert(pool: &PgPool, input: &CreateImageRecord) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO images (id, url, description, category, embedding) \
             VALUES ($1, $2, $3, $4, $5::vector) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&input.id)
        .bind(&input.url)
        .bind(&input.description)
        .bind(input.category.label())
        .bind(vector_literal(&input.embedding))
        .execute(pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn exists(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM images WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }

    /// Up to `limit` records chosen uniformly at random.
    pub async fn random_sample(pool: &PgPool, limit: i64) -> Result<Vec<ImageRecord>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM images ORDER BY random() LIMIT $1");
        sqlx::query_as::<_, ImageRecord>(&query)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// The `limit` records nearest to `embedding` by cosine distance,
    /// ascending, ties broken by id. `category` restricts the candidates
    /// when given.
    ///
    /// The iterative scan may yield candidates slightly out of order, so
    /// the outer query sorts the final page exactly.
    pub async fn search_nearest(
        pool: &PgPool,
        embedding: &[f32],
        limit: i64,
        category: Option<&str>,
    ) -> Result<Vec<ImageSearchHit>, sqlx::Error> {
        let ef_search = limit.clamp(MIN_EF_SEARCH, MAX_EF_SEARCH);
        let sql = "\
            SELECT id, url, description, category, distance \
            FROM ( \
                SELECT id, url, description, category, \
                       (embedding <=> $1::vector)::float8 AS distance \
                FROM images \
                WHERE ($3::text IS NULL OR category = $3) \
                ORDER BY embedding <=> $1::vector \
                LIMIT $2 \
            ) nearest \
            ORDER BY distance, id";

        let mut tx = pool.begin().await?;
        sqlx::query(
            "SELECT set_config('hnsw.ef_search', $1, true), \
                    set_config('hnsw.iterative_scan', 'relaxed_order', true)",
        )
        .bind(ef_search.to_string())
        .execute(&mut *tx)
        .await?;

        let hits = sqlx::query_as::<_, ImageSearchHit>(sql)
            .bind(vector_literal(embedding))
            .bind(limit)
            .bind(category)
            .fetch_all(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(hits)
    }
}
