//! Idempotent schema optimization.
//!
//! The migrator brings the physical layout of a collection's tables up to
//! what efficient vector search needs: the pgvector extension, a fixed-width
//! `vector(n)` embedding column, an HNSW index for approximate
//! nearest-neighbor queries, and a GIN index for metadata filtering.
//!
//! Every step is wrapped independently. A step that fails is recorded in
//! [`OptimizationReport::errors`] and later steps still run; a database that
//! is already in a good-enough state can accept writes even when one
//! optimization could not be applied. Each statement commits on its own, and
//! DDL is only executed when an introspection probe shows it is needed, so
//! repeated passes over an already-optimized collection apply nothing.
//!
//! Concurrent passes against the *same* collection are not serialized here;
//! callers must not run them in parallel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::inspector::SchemaInspector;

/// HNSW construction parameters (graph degree, build-time candidate list).
const HNSW_M: u32 = 16;
const HNSW_EF_CONSTRUCTION: u32 = 64;

/// Outcome of one optimization pass. Created fresh per pass, append-only,
/// never rolled back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationReport {
    /// Human-readable descriptions of the DDL actually executed.
    pub optimizations_applied: Vec<String>,
    /// Step failures, recorded instead of raised.
    pub errors: Vec<String>,
    /// Expected query-side effects of the applied optimizations.
    pub performance_improvements: Vec<String>,
    /// When the pass ran.
    pub timestamp: DateTime<Utc>,
}

impl Default for OptimizationReport {
    fn default() -> Self {
        Self {
            optimizations_applied: Vec::new(),
            errors: Vec::new(),
            performance_improvements: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}

impl OptimizationReport {
    fn new() -> Self {
        Self::default()
    }

    /// Whether the pass completed without recording any step failure.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Catalog state observed for one collection's embedding table before a
/// pass. Filled from [`SchemaInspector`] probes; never from DDL errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaProbe {
    pub extension_installed: bool,
    pub table_exists: bool,
    /// `udt_name` of the embedding column, `None` when the column is absent.
    pub embedding_column_udt: Option<String>,
    pub hnsw_index_exists: bool,
    pub gin_index_exists: bool,
}

/// One DDL action the pass has decided to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedStep {
    InstallExtension,
    MigrateEmbeddingColumn { from: String },
    CreateHnswIndex,
    CreateGinIndex,
}

impl PlannedStep {
    /// Context prefix used when the step's DDL fails.
    fn label(&self) -> &'static str {
        match self {
            Self::InstallExtension => "pgvector extension",
            Self::MigrateEmbeddingColumn { .. } => "embedding column migration",
            Self::CreateHnswIndex => "HNSW index",
            Self::CreateGinIndex => "GIN index",
        }
    }

    /// Query-side effect recorded in the report when the step succeeds.
    fn performance_note(&self) -> Option<&'static str> {
        match self {
            Self::InstallExtension => None,
            Self::MigrateEmbeddingColumn { .. } => {
                Some("fixed-width vector column enables index-backed similarity scans")
            }
            Self::CreateHnswIndex => {
                Some("HNSW index accelerates approximate nearest-neighbor search")
            }
            Self::CreateGinIndex => Some("GIN index accelerates metadata-filtered queries"),
        }
    }
}

/// Decide which steps a probed state still needs, in execution order.
///
/// Pure; the executor runs exactly this plan. A fully optimized state yields
/// an empty plan, which is what makes a repeated pass apply nothing. When the
/// table is absent everything past the extension is deferred to the first
/// write, which creates the base tables.
pub fn plan_steps(probe: &SchemaProbe) -> Vec<PlannedStep> {
    let mut steps = Vec::new();
    if !probe.extension_installed {
        steps.push(PlannedStep::InstallExtension);
    }
    if !probe.table_exists {
        return steps;
    }
    if let Some(udt) = &probe.embedding_column_udt {
        if udt != "vector" {
            steps.push(PlannedStep::MigrateEmbeddingColumn { from: udt.clone() });
        }
    }
    if !probe.hnsw_index_exists {
        steps.push(PlannedStep::CreateHnswIndex);
    }
    if !probe.gin_index_exists {
        steps.push(PlannedStep::CreateGinIndex);
    }
    steps
}

/// Executes the idempotent DDL pass over one collection's embedding table.
pub struct SchemaMigrator<'a> {
    pool: &'a PgPool,
}

impl<'a> SchemaMigrator<'a> {
    /// Create a migrator over the given pool.
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Run the optimization pass against `embedding_table`.
    ///
    /// Probes the catalogs, derives the plan with [`plan_steps`], then
    /// executes each planned step independently: extension install, embedding
    /// column migration to `vector(dimension)`, HNSW index, GIN metadata
    /// index. Failures land in the report, never in a `Result`.
    pub async fn optimize(&self, embedding_table: &str, dimension: usize) -> OptimizationReport {
        let mut report = OptimizationReport::new();
        let probe = self.probe(embedding_table, &mut report).await;

        for step in plan_steps(&probe) {
            match self.execute(&step, embedding_table, dimension).await {
                Ok(applied) => {
                    report.optimizations_applied.push(applied);
                    if let Some(note) = step.performance_note() {
                        report.performance_improvements.push(note.to_string());
                    }
                }
                Err(e) => report.errors.push(format!("{}: {e}", step.label())),
            }
        }

        if report.is_clean() {
            info!(
                table = embedding_table,
                applied = report.optimizations_applied.len(),
                "schema optimization pass completed"
            );
        } else {
            warn!(
                table = embedding_table,
                applied = report.optimizations_applied.len(),
                errors = report.errors.len(),
                "schema optimization pass completed with step failures"
            );
        }

        report
    }

    /// Read the catalog state the plan is derived from. A probe that cannot
    /// be read is recorded in the report and its field set so that no DDL is
    /// attempted against an unknown state.
    async fn probe(&self, table: &str, report: &mut OptimizationReport) -> SchemaProbe {
        let inspector = SchemaInspector::new(self.pool);
        let mut probe = SchemaProbe::default();

        match inspector.extension_installed().await {
            Ok(installed) => probe.extension_installed = installed,
            Err(e) => {
                report.errors.push(format!("pgvector extension: {e}"));
                probe.extension_installed = true;
            }
        }

        match inspector.table_exists(table).await {
            Ok(true) => probe.table_exists = true,
            Ok(false) => {
                // The client library creates the base tables on first write;
                // column and index work waits until then.
                debug!(table, "embedding table absent, deferring optimization");
                return probe;
            }
            Err(e) => {
                report.errors.push(format!("table existence check: {e}"));
                return probe;
            }
        }

        match inspector.column_udt(table, "embedding").await {
            Ok(udt) => probe.embedding_column_udt = udt,
            Err(e) => report.errors.push(format!("embedding column migration: {e}")),
        }

        match inspector.index_exists(table, "hnsw", "embedding").await {
            Ok(exists) => probe.hnsw_index_exists = exists,
            Err(e) => {
                report.errors.push(format!("HNSW index: {e}"));
                probe.hnsw_index_exists = true;
            }
        }

        match inspector.index_exists(table, "gin", "metadata").await {
            Ok(exists) => probe.gin_index_exists = exists,
            Err(e) => {
                report.errors.push(format!("GIN index: {e}"));
                probe.gin_index_exists = true;
            }
        }

        probe
    }

    async fn execute(
        &self,
        step: &PlannedStep,
        table: &str,
        dimension: usize,
    ) -> sqlx::Result<String> {
        match step {
            PlannedStep::InstallExtension => {
                sqlx::query("CREATE EXTENSION IF NOT EXISTS vector").execute(self.pool).await?;
                debug!("installed pgvector extension");
                Ok("installed pgvector extension".to_string())
            }
            PlannedStep::MigrateEmbeddingColumn { from } => {
                // Blocking DDL; only planned when the current type differs.
                let alter_sql = format!(
                    "ALTER TABLE {table} ALTER COLUMN embedding \
                     TYPE vector({dimension}) USING embedding::vector({dimension})"
                );
                sqlx::query(&alter_sql).execute(self.pool).await?;
                info!(table, dimension, from = %from, "migrated embedding column to vector type");
                Ok(format!("migrated embedding column from {from} to vector({dimension})"))
            }
            PlannedStep::CreateHnswIndex => {
                let index_name = format!("{table}_embedding_hnsw_idx");
                let index_sql = format!(
                    "CREATE INDEX IF NOT EXISTS {index_name} ON {table} \
                     USING hnsw (embedding vector_cosine_ops) \
                     WITH (m = {HNSW_M}, ef_construction = {HNSW_EF_CONSTRUCTION})"
                );
                sqlx::query(&index_sql).execute(self.pool).await?;
                info!(table, index = %index_name, "created HNSW index on embedding column");
                Ok(format!("created HNSW index {index_name}"))
            }
            PlannedStep::CreateGinIndex => {
                let index_name = format!("{table}_metadata_gin_idx");
                let index_sql = format!(
                    "CREATE INDEX IF NOT EXISTS {index_name} ON {table} USING gin (metadata)"
                );
                sqlx::query(&index_sql).execute(self.pool).await?;
                info!(table, index = %index_name, "created GIN index on metadata column");
                Ok(format!("created GIN index {index_name}"))
            }
        }
    }
}
