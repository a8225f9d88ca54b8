//! Read-only schema introspection.
//!
//! Every check here queries the PostgreSQL catalogs; nothing in this module
//! executes DDL. The migrator and the API selector both decide what to do
//! based on these probes rather than on error-driven retries.

use sqlx::PgPool;

/// Read-only view over the catalogs of the connected database.
pub struct SchemaInspector<'a> {
    pool: &'a PgPool,
}

impl<'a> SchemaInspector<'a> {
    /// Create an inspector over the given pool.
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Whether the pgvector extension is installed.
    pub async fn extension_installed(&self) -> sqlx::Result<bool> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = 'vector')")
            .fetch_one(self.pool)
            .await
    }

    /// Whether a table with the given name exists in the current schema.
    pub async fn table_exists(&self, table: &str) -> sqlx::Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM information_schema.tables
                WHERE table_schema = current_schema() AND table_name = $1
            )",
        )
        .bind(table)
        .fetch_one(self.pool)
        .await
    }

    /// The underlying type name (`udt_name`) of a column, or `None` if the
    /// column does not exist.
    pub async fn column_udt(&self, table: &str, column: &str) -> sqlx::Result<Option<String>> {
        sqlx::query_scalar(
            "SELECT udt_name FROM information_schema.columns
             WHERE table_schema = current_schema()
               AND table_name = $1 AND column_name = $2",
        )
        .bind(table)
        .bind(column)
        .fetch_optional(self.pool)
        .await
    }

    /// Whether a column exists on the given table.
    pub async fn has_column(&self, table: &str, column: &str) -> sqlx::Result<bool> {
        Ok(self.column_udt(table, column).await?.is_some())
    }

    /// Whether any index on `table` in the current schema uses the given
    /// access method over the given column. Existence is decided from
    /// `pg_indexes.indexdef`, not by attempting a create and catching the
    /// error.
    pub async fn index_exists(
        &self,
        table: &str,
        method: &str,
        column: &str,
    ) -> sqlx::Result<bool> {
        let definitions: Vec<String> = sqlx::query_scalar(
            "SELECT indexdef FROM pg_indexes
             WHERE schemaname = current_schema() AND tablename = $1",
        )
        .bind(table)
        .fetch_all(self.pool)
        .await?;

        Ok(definitions.iter().any(|def| index_covers_column(def, method, column)))
    }
}

/// Decide from an `indexdef` whether the index uses `method` with `column`
/// as one of its keys.
///
/// `indexdef` has the shape
/// `CREATE INDEX name ON schema.table USING method (col opclass, ...)`.
/// Matching against the parsed key list avoids false positives when the
/// table or index name merely contains the column name as a substring.
fn index_covers_column(indexdef: &str, method: &str, column: &str) -> bool {
    let marker = format!(" USING {method} (");
    let Some(start) = indexdef.find(&marker) else {
        return false;
    };
    let keys = &indexdef[start + marker.len()..];
    let Some(end) = keys.find(')') else {
        return false;
    };
    keys[..end].split(',').any(|key| key.trim().split_whitespace().next() == Some(column))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_hnsw_index_on_embedding_column() {
        let def = "CREATE INDEX vec_pg_embedding_embedding_hnsw_idx ON public.vec_pg_embedding \
                   USING hnsw (embedding vector_cosine_ops) WITH (m='16', ef_construction='64')";
        assert!(index_covers_column(def, "hnsw", "embedding"));
    }

    #[test]
    fn table_name_containing_column_name_is_not_a_match() {
        // The table name contains "embedding"; only the keyed column counts.
        let def = "CREATE INDEX other_idx ON public.vec_pg_embedding \
                   USING hnsw (other_col vector_cosine_ops)";
        assert!(!index_covers_column(def, "hnsw", "embedding"));
    }

    #[test]
    fn matches_gin_index_on_metadata_column() {
        let def = "CREATE INDEX vec_pg_embedding_metadata_gin_idx ON public.vec_pg_embedding \
                   USING gin (metadata)";
        assert!(index_covers_column(def, "gin", "metadata"));
        assert!(!index_covers_column(def, "gin", "embedding"));
    }

    #[test]
    fn method_must_match() {
        let def = "CREATE UNIQUE INDEX pk ON public.vec_pg_embedding USING btree (embedding)";
        assert!(!index_covers_column(def, "hnsw", "embedding"));
    }

    #[test]
    fn any_key_of_a_multicolumn_index_matches() {
        let def = "CREATE INDEX multi ON public.t USING gin (metadata, extra)";
        assert!(index_covers_column(def, "gin", "extra"));
    }
}
