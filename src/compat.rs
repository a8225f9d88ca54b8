//! Client-shape compatibility selection.
//!
//! Two incompatible client-library shapes exist for the embedding table: the
//! new shape keys rows by an explicit `id` text column, the legacy shape by a
//! generated uuid with no `id` column. Which shapes are available is an
//! explicit capability question ([`ClientRegistry`]); whether the available
//! shape fits the schema already on disk is a separate probe. The two are
//! combined once per orchestration run, and the resulting [`SelectedApi`] is
//! passed as a value into the writer and retriever. It is never stored as
//! shared process state, so runs against different collections cannot
//! interfere.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::error::{Result, StoreError};
use crate::inspector::SchemaInspector;

/// Identity column that distinguishes the new client shape.
const IDENTITY_COLUMN: &str = "id";

/// A client-library shape for the embedding table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientShape {
    /// Rows keyed by an explicit `id` text column.
    New,
    /// Rows keyed by a generated uuid, no `id` column.
    Legacy,
}

/// Which client-library shapes this process can use.
///
/// Replaces load-time optional-import probing: availability is registered
/// explicitly and queried on demand, independent of schema compatibility.
#[derive(Debug, Clone)]
pub struct ClientRegistry {
    new_shape: bool,
    legacy_shape: bool,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::all()
    }
}

impl ClientRegistry {
    /// Registry with both shapes available.
    pub fn all() -> Self {
        Self { new_shape: true, legacy_shape: true }
    }

    /// Registry with no shapes available.
    pub fn empty() -> Self {
        Self { new_shape: false, legacy_shape: false }
    }

    /// Registry with exactly one shape available.
    pub fn only(shape: ClientShape) -> Self {
        let mut registry = Self::empty();
        registry.register(shape);
        registry
    }

    /// Mark a shape as available.
    pub fn register(&mut self, shape: ClientShape) {
        match shape {
            ClientShape::New => self.new_shape = true,
            ClientShape::Legacy => self.legacy_shape = true,
        }
    }

    /// Whether a shape is available.
    pub fn has(&self, shape: ClientShape) -> bool {
        match shape {
            ClientShape::New => self.new_shape,
            ClientShape::Legacy => self.legacy_shape,
        }
    }
}

/// The client shape locked in for the rest of an orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectedApi {
    /// Use the new client shape.
    New,
    /// Use the legacy client shape.
    Legacy,
}

/// Outcome of probing the embedding table for the identity column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityProbe {
    /// The embedding table does not exist yet (fresh database).
    TableMissing,
    /// The table exists and carries the identity column.
    Present,
    /// The table exists without the identity column (legacy layout).
    Absent,
}

/// Combine shape availability with the schema probe into a selection.
///
/// A fresh database is compatible with the new shape, since there is no
/// existing layout to conflict with. An existing table without the identity
/// column forces the legacy shape when it is available; the fallback is
/// explicit and logged.
///
/// # Errors
///
/// Returns [`StoreError::ApiIncompatibility`] when no registered shape fits.
pub fn resolve_api(registry: &ClientRegistry, probe: IdentityProbe) -> Result<SelectedApi> {
    if registry.has(ClientShape::New) {
        match probe {
            IdentityProbe::TableMissing | IdentityProbe::Present => {
                debug!(?probe, "selected new client shape");
                return Ok(SelectedApi::New);
            }
            IdentityProbe::Absent => {
                if registry.has(ClientShape::Legacy) {
                    warn!("existing schema lacks the identity column, falling back to legacy client shape");
                    return Ok(SelectedApi::Legacy);
                }
                return Err(StoreError::ApiIncompatibility(
                    "existing embedding table lacks the identity column and no legacy-shape client is registered".to_string(),
                ));
            }
        }
    }

    if registry.has(ClientShape::Legacy) {
        debug!("new client shape not registered, using legacy shape");
        return Ok(SelectedApi::Legacy);
    }

    Err(StoreError::ApiIncompatibility(
        "no vector store client shape is registered".to_string(),
    ))
}

/// Probe the schema and select the client shape for this run.
///
/// Decided once per orchestration; the result must be threaded explicitly
/// through the writer and retriever.
pub async fn select_api(
    pool: &PgPool,
    registry: &ClientRegistry,
    embedding_table: &str,
) -> Result<SelectedApi> {
    let inspector = SchemaInspector::new(pool);

    let table_exists = inspector
        .table_exists(embedding_table)
        .await
        .map_err(|e| StoreError::database("API selection", e))?;
    let probe = if !table_exists {
        IdentityProbe::TableMissing
    } else if inspector
        .has_column(embedding_table, IDENTITY_COLUMN)
        .await
        .map_err(|e| StoreError::database("API selection", e))?
    {
        IdentityProbe::Present
    } else {
        IdentityProbe::Absent
    };

    resolve_api(registry, probe)
}
