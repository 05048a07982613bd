use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use vecroute_common::{AppConfig, Result, VecRouteError};

use super::executor::{SqlExecutor, SqlValue};
use super::operator::NativeOperator;
use crate::backend::VectorBackend;
use crate::metric::DistanceMetric;
use crate::types::{
    ensure_dimension, Embedding, Metadata, SearchQuery, SearchResult, VectorEntry, VectorInput,
};

/// Where vectors live inside the relational schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlBackendConfig {
    /// Table (optionally schema-qualified) holding the domain rows
    pub table: String,

    /// Column identifying rows
    pub id_column: String,

    /// Vector-typed column
    pub vector_column: String,

    /// JSON/JSONB metadata column
    pub metadata_column: String,
}

impl Default for SqlBackendConfig {
    fn default() -> Self {
        Self {
            table: "documents".to_string(),
            id_column: "id".to_string(),
            vector_column: "embedding".to_string(),
            metadata_column: "metadata".to_string(),
        }
    }
}

impl SqlBackendConfig {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            table: config.sql_table.clone(),
            id_column: config.sql_id_column.clone(),
            vector_column: config.sql_vector_column.clone(),
            metadata_column: config.sql_metadata_column.clone(),
        }
    }

    /// Names are spliced into statements, so only plain identifiers pass
    pub fn validate(&self) -> Result<()> {
        validate_identifier(&self.table, 2)?;
        validate_identifier(&self.id_column, 1)?;
        validate_identifier(&self.vector_column, 1)?;
        validate_identifier(&self.metadata_column, 1)?;
        Ok(())
    }
}

fn validate_identifier(name: &str, max_parts: usize) -> Result<()> {
    let parts: Vec<&str> = name.split('.').collect();
    let valid_part = |part: &&str| {
        let mut chars = part.chars();
        matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };

    if parts.len() > max_parts || !parts.iter().all(valid_part) {
        return Err(VecRouteError::validation(format!(
            "Invalid SQL identifier '{}'",
            name
        )));
    }
    Ok(())
}

/// Backend that attaches vectors to existing rows and lets the SQL engine rank them
///
/// Rows are never inserted or deleted here: `add` updates the vector
/// column of a row that must already exist and `remove` sets it to NULL.
pub struct SqlNativeBackend {
    executor: Arc<dyn SqlExecutor>,
    config: SqlBackendConfig,
    dimension: usize,
    metric: DistanceMetric,
    operator: NativeOperator,
}

impl SqlNativeBackend {
    pub fn new(
        executor: Arc<dyn SqlExecutor>,
        config: SqlBackendConfig,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self> {
        config.validate()?;
        let operator = NativeOperator::for_metric(metric)?;

        info!(
            "SQL backend configured - table={}, column={}, operator={}",
            config.table,
            config.vector_column,
            operator.token()
        );

        Ok(Self {
            executor,
            config,
            dimension,
            metric,
            operator,
        })
    }

    pub fn operator(&self) -> NativeOperator {
        self.operator
    }

    fn build_search(&self, query: &SearchQuery) -> (String, Vec<SqlValue>) {
        let SqlBackendConfig {
            table,
            id_column,
            vector_column,
            metadata_column,
        } = &self.config;
        let op = self.operator.token();

        let mut params = vec![SqlValue::Vector(query.vector.clone())];
        let mut sql = format!(
            "SELECT CAST({id} AS TEXT) AS id, {meta} AS metadata, {vec} {op} $1::vector AS distance \
             FROM {table} WHERE {vec} IS NOT NULL",
            id = id_column,
            meta = metadata_column,
            vec = vector_column,
            op = op,
            table = table,
        );

        let mut filters: Vec<(&String, &String)> = query.filters.iter().collect();
        filters.sort();
        for (key, value) in filters {
            params.push(SqlValue::Text(key.clone()));
            params.push(SqlValue::Text(value.clone()));
            sql.push_str(&format!(
                " AND {} ->> ${} = ${}",
                metadata_column,
                params.len() - 1,
                params.len()
            ));
        }

        if let Some(bound) = query.threshold.and_then(|t| self.operator.distance_bound(t)) {
            params.push(SqlValue::Float(bound));
            sql.push_str(&format!(
                " AND ({} {} $1::vector) <= ${}",
                vector_column,
                op,
                params.len()
            ));
        }

        params.push(SqlValue::Int(i64::try_from(query.limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" ORDER BY distance ASC LIMIT ${}", params.len()));

        (sql, params)
    }

    /// Metric-consistent distance for a similarity computed from native output
    fn reported_distance(&self, native: f64, similarity: f64) -> f64 {
        match self.operator {
            NativeOperator::L2 => native,
            NativeOperator::Cosine | NativeOperator::NegativeInnerProduct => 1.0 - similarity,
        }
    }
}

#[async_trait]
impl VectorBackend for SqlNativeBackend {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn metric(&self) -> DistanceMetric {
        self.metric
    }

    async fn add(
        &self,
        id: &str,
        vector: VectorInput,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        let embedding = vector.into_embedding(self.dimension)?;
        let c = &self.config;

        // upsert replaces metadata wholesale; omitted metadata is an empty object
        let sql = format!(
            "UPDATE {} SET {} = $1::vector, {} = $2::jsonb WHERE {} = $3",
            c.table, c.vector_column, c.metadata_column, c.id_column
        );
        let params = vec![
            SqlValue::Vector(embedding.into_vector()),
            SqlValue::Json(serde_json::to_value(metadata.unwrap_or_default())?),
            SqlValue::from(id),
        ];

        let affected = self.executor.execute(&sql, &params).await?;
        if affected == 0 {
            return Err(VecRouteError::not_found(format!(
                "No row with {} = '{}' in {}",
                c.id_column, id, c.table
            )));
        }

        debug!("Attached vector to {}.{} = '{}'", c.table, c.id_column, id);
        Ok(id.to_string())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        let c = &self.config;
        let sql = format!(
            "UPDATE {} SET {} = NULL WHERE {} = $1 AND {} IS NOT NULL",
            c.table, c.vector_column, c.id_column, c.vector_column
        );
        Ok(self.executor.execute(&sql, &[SqlValue::from(id)]).await? > 0)
    }

    async fn clear(&self) -> Result<usize> {
        let c = &self.config;
        let sql = format!(
            "UPDATE {} SET {} = NULL WHERE {} IS NOT NULL",
            c.table, c.vector_column, c.vector_column
        );
        let affected = self.executor.execute(&sql, &[]).await?;
        info!("Cleared {} vectors from {}", affected, c.table);
        Ok(affected as usize)
    }

    async fn get(&self, id: &str) -> Result<Option<VectorEntry>> {
        let c = &self.config;
        let sql = format!(
            "SELECT CAST({id} AS TEXT) AS id, {vec} AS vector, {meta} AS metadata \
             FROM {table} WHERE {id} = $1 AND {vec} IS NOT NULL LIMIT 1",
            id = c.id_column,
            vec = c.vector_column,
            meta = c.metadata_column,
            table = c.table,
        );

        let rows = self.executor.query(&sql, &[SqlValue::from(id)]).await?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let embedding = Embedding::with_dimension(row.get_vector("vector")?, self.dimension, "")?;
        Ok(Some(VectorEntry::new(
            row.get_text("id")?,
            embedding,
            row.get_metadata("metadata")?,
        )))
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>> {
        ensure_dimension(self.dimension, query.vector.len())?;
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        let (sql, params) = self.build_search(query);
        let rows = self.executor.query(&sql, &params).await?;
        let returned = rows.len();

        let mut results = Vec::with_capacity(returned);
        for row in rows {
            let native = row.get_f64("distance")?;
            let similarity = self.operator.similarity(native);
            // the engine already filtered on the bound; this catches rounding at the edge
            if !query.passes_threshold(similarity) {
                continue;
            }
            results.push(SearchResult::new(
                row.get_text("id")?,
                similarity,
                self.reported_distance(native, similarity),
                row.get_metadata("metadata")?,
            ));
        }

        results.sort_by(SearchResult::ranking);
        results.truncate(query.limit);

        debug!(
            "SQL search completed - {} results ({} rows returned)",
            results.len(),
            returned
        );
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let c = &self.config;
        let sql = format!(
            "SELECT COUNT(*) AS count FROM {} WHERE {} IS NOT NULL",
            c.table, c.vector_column
        );
        let rows = self.executor.query(&sql, &[]).await?;
        let count = match rows.first() {
            Some(row) => row.get_i64("count")?,
            None => 0,
        };
        Ok(count.max(0) as usize)
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let c = &self.config;
        let sql = format!(
            "SELECT 1 AS present FROM {} WHERE {} = $1 AND {} IS NOT NULL LIMIT 1",
            c.table, c.id_column, c.vector_column
        );
        Ok(!self.executor.query(&sql, &[SqlValue::from(id)]).await?.is_empty())
    }
}
