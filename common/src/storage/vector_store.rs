use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::vector_record::VectorRecord},
};

/// Index options shared by every vector table.
const HNSW_OPTIONS: &str = "DIST COSINE TYPE F32 EFC 100 M 8";

/// Where records land: a vector table plus a namespace partition within it.
/// Validated on construction so table names never carry query syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    index_name: String,
    namespace: String,
}

impl IndexTarget {
    pub fn new(index_name: &str, namespace: &str) -> Result<Self, AppError> {
        if index_name.is_empty()
            || !index_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(format!(
                "invalid index name '{index_name}': expected one or more of [A-Za-z0-9_]"
            )));
        }

        if namespace.trim().is_empty() {
            return Err(AppError::Validation(
                "namespace must not be empty".to_string(),
            ));
        }

        Ok(Self {
            index_name: index_name.to_owned(),
            namespace: namespace.to_owned(),
        })
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// Upserts every record in one transaction. Record keys are composite
/// `[namespace, id]`, so identical ids in different namespaces stay separate
/// while re-ingesting a file overwrites its previous records.
const UPSERT_RECORDS: &str = r"
    BEGIN TRANSACTION;
    LET $rows = $records;

    FOR $row IN $rows {
        UPSERT type::thing($table, [$namespace, $row.id]) CONTENT {
            namespace: $namespace,
            record_id: $row.id,
            embedding: $row.embedding,
            metadata: $row.metadata
        };
    };

    COMMIT TRANSACTION;
";

/// A record as it comes back out of a vector table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StoredVectorRecord {
    pub record_id: String,
    pub embedding: Vec<f32>,
    pub metadata: crate::storage::types::vector_record::VectorMetadata,
}

/// SurrealDB-backed vector store. One table per index name; HNSW over the
/// `embedding` field of each table.
#[derive(Clone)]
pub struct VectorStore {
    db: Arc<SurrealDbClient>,
}

impl VectorStore {
    pub fn new(db: Arc<SurrealDbClient>) -> Self {
        Self { db }
    }

    /// Makes sure the target table and its HNSW index exist before anything is
    /// written. Idempotent: re-running with the same dimension is a no-op and a
    /// changed dimension overwrites the index definition.
    pub async fn ensure_index(
        &self,
        target: &IndexTarget,
        dimension: usize,
    ) -> Result<(), AppError> {
        ensure_index_inner(&self.db, target, dimension)
            .await
            .map_err(|err| AppError::InternalError(err.to_string()))
    }

    /// Writes the whole batch in one transaction. Either every record in
    /// `records` is visible afterwards or none of them are.
    pub async fn upsert_batch(
        &self,
        target: &IndexTarget,
        records: Vec<VectorRecord>,
    ) -> Result<(), AppError> {
        if records.is_empty() {
            return Ok(());
        }

        let res = self
            .db
            .client
            .query(UPSERT_RECORDS)
            .bind(("table", target.index_name().to_owned()))
            .bind(("namespace", target.namespace().to_owned()))
            .bind(("records", records))
            .await?;

        res.check()?;

        Ok(())
    }

    /// Number of records in the target's namespace.
    pub async fn count_records(&self, target: &IndexTarget) -> Result<usize, AppError> {
        #[derive(Debug, Deserialize)]
        struct CountRow {
            count: u64,
        }

        let mut response = self
            .db
            .client
            .query("SELECT count() AS count FROM type::table($table) WHERE namespace = $namespace GROUP ALL;")
            .bind(("table", target.index_name().to_owned()))
            .bind(("namespace", target.namespace().to_owned()))
            .await?;

        let rows: Vec<CountRow> = response.take(0)?;

        Ok(rows.first().map(|row| row.count).unwrap_or(0) as usize)
    }

    /// Every record in the target's namespace, in batch then position order.
    pub async fn fetch_records(
        &self,
        target: &IndexTarget,
    ) -> Result<Vec<StoredVectorRecord>, AppError> {
        let mut response = self
            .db
            .client
            .query(
                "SELECT record_id, embedding, metadata FROM type::table($table) \
                 WHERE namespace = $namespace \
                 ORDER BY metadata.batch_index, metadata.index;",
            )
            .bind(("table", target.index_name().to_owned()))
            .bind(("namespace", target.namespace().to_owned()))
            .await?;

        let records: Vec<StoredVectorRecord> = response.take(0)?;

        Ok(records)
    }
}

async fn ensure_index_inner(
    db: &SurrealDbClient,
    target: &IndexTarget,
    dimension: usize,
) -> Result<()> {
    let table = target.index_name();

    // The table has to exist before INFO FOR TABLE can report on its indexes.
    let res = db
        .client
        .query(format!("DEFINE TABLE IF NOT EXISTS {table} SCHEMALESS;"))
        .await
        .with_context(|| format!("defining vector table {table}"))?;
    res.check()
        .with_context(|| format!("table definition failed for {table}"))?;

    let index_name = hnsw_index_name(table);
    let definition = match hnsw_index_state(db, table, &index_name, dimension).await? {
        HnswIndexState::Missing | HnswIndexState::Matches => format!(
            "DEFINE INDEX IF NOT EXISTS {index_name} ON TABLE {table} \
             FIELDS embedding HNSW DIMENSION {dimension} {HNSW_OPTIONS};"
        ),
        HnswIndexState::Different(existing) => {
            info!(
                index = %index_name,
                table = %table,
                existing_dimension = existing,
                target_dimension = dimension,
                "Overwriting HNSW index to match new embedding dimension"
            );
            format!(
                "DEFINE INDEX OVERWRITE {index_name} ON TABLE {table} \
                 FIELDS embedding HNSW DIMENSION {dimension} {HNSW_OPTIONS};"
            )
        }
    };

    let res = db
        .client
        .query(definition)
        .await
        .with_context(|| format!("creating index {index_name} on table {table}"))?;
    res.check()
        .with_context(|| format!("index definition failed for {index_name} on {table}"))?;

    Ok(())
}

fn hnsw_index_name(table: &str) -> String {
    format!("idx_embedding_{table}")
}

enum HnswIndexState {
    Missing,
    Matches,
    Different(u64),
}

async fn hnsw_index_state(
    db: &SurrealDbClient,
    table: &str,
    index_name: &str,
    expected_dimension: usize,
) -> Result<HnswIndexState> {
    let info_query = format!("INFO FOR TABLE {table};");
    let mut response = db
        .client
        .query(info_query)
        .await
        .with_context(|| format!("fetching table info for {table}"))?;

    let info: surrealdb::Value = response
        .take(0)
        .context("failed to take table info response")?;

    let info_json: Value =
        serde_json::to_value(info).context("serializing table info to JSON for parsing")?;

    let Some(indexes) = info_json
        .get("Object")
        .and_then(|o| o.get("indexes"))
        .and_then(|i| i.get("Object"))
        .and_then(|i| i.as_object())
    else {
        return Ok(HnswIndexState::Missing);
    };

    let Some(definition) = indexes
        .get(index_name)
        .and_then(|details| details.get("Strand"))
        .and_then(|v| v.as_str())
    else {
        return Ok(HnswIndexState::Missing);
    };

    let Some(current_dimension) = extract_dimension(definition) else {
        return Ok(HnswIndexState::Missing);
    };

    if current_dimension == expected_dimension as u64 {
        Ok(HnswIndexState::Matches)
    } else {
        Ok(HnswIndexState::Different(current_dimension))
    }
}

fn extract_dimension(definition: &str) -> Option<u64> {
    definition
        .split("DIMENSION")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.trim_end_matches(';').parse::<u64>().ok())
}
