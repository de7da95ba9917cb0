//! Server context shared by every request handler

use std::path::Path;
use std::sync::Arc;

use plinko_core::{Database, HintSnapshot, PlinkoParams, QueryEngine};

use crate::error::Result;

/// Owned server state: the database (through the query engine) and its sizing
#[derive(Debug, Clone)]
pub struct ServerContext {
    engine: QueryEngine,
    params: PlinkoParams,
}

impl ServerContext {
    /// Serve from an already decoded snapshot
    pub fn from_snapshot(snapshot: HintSnapshot) -> Self {
        let params = snapshot.params();
        if let Err(e) = snapshot.verify() {
            tracing::warn!(error = %e, "Snapshot sizing differs from planned parameters");
        }
        let database = Arc::new(snapshot.into_database());
        Self::new(database, params)
    }

    /// Load and decode `hint.bin`. A malformed snapshot is fatal.
    pub fn load(path: &Path) -> Result<Self> {
        let snapshot = HintSnapshot::load(path)?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn new(database: Arc<Database>, params: PlinkoParams) -> Self {
        let engine = QueryEngine::new(database, params.chunk_size, params.set_size);
        Self { engine, params }
    }

    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    pub fn params(&self) -> &PlinkoParams {
        &self.params
    }

    /// Database shared with an in-process update service
    pub fn database(&self) -> Arc<Database> {
        Arc::clone(self.engine.database())
    }
}
