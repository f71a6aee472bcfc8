//! Handle-addressed storage of the uploaded datasets.
//!
//! Each dataset lives behind an `Arc` and is never mutated. A new upload
//! under an existing handle swaps the `Arc` under a short write lock, so
//! that a map request always works on a consistent snapshot.

use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info};
use snafu::OptionExt;

use crate::columns::ColumnResolver;
use crate::config::*;
use crate::filter::RouteFilter;

/// Opaque identifier of a dataset in a [DatasetStore].
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct DatasetHandle(u64);

impl Display for DatasetHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dataset-{:08}", self.0)
    }
}

pub struct DatasetStore {
    ingest_rules: IngestRules,
    resolver: ColumnResolver,
    render_rules: RenderRules,
    next_handle: AtomicU64,
    datasets: RwLock<HashMap<DatasetHandle, Arc<CanonicalDataset>>>,
}

impl Default for DatasetStore {
    fn default() -> Self {
        DatasetStore::new(
            &IngestRules::DEFAULT_RULES,
            &ColumnResolver::default(),
            &RenderRules::default(),
        )
    }
}

impl DatasetStore {
    pub fn new(
        ingest_rules: &IngestRules,
        resolver: &ColumnResolver,
        render_rules: &RenderRules,
    ) -> DatasetStore {
        DatasetStore {
            ingest_rules: ingest_rules.clone(),
            resolver: resolver.clone(),
            render_rules: render_rules.clone(),
            next_handle: AtomicU64::new(1),
            datasets: RwLock::new(HashMap::new()),
        }
    }

    /// Ingests a table and stores it under a fresh handle.
    pub fn upload(&self, table: &TabularData) -> Result<DatasetHandle, RouteError> {
        let dataset = crate::ingest(table, &self.ingest_rules, &self.resolver)?;
        let handle = DatasetHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        info!("upload: {} records stored as {}", dataset.len(), handle);
        self.write_lock().insert(handle, Arc::new(dataset));
        Ok(handle)
    }

    /// Ingests a table and swaps it in place of the dataset of `handle`.
    ///
    /// The ingestion runs before any lock is taken: when it fails, the
    /// standing dataset stays in place.
    pub fn replace(&self, handle: DatasetHandle, table: &TabularData) -> Result<(), RouteError> {
        let dataset = crate::ingest(table, &self.ingest_rules, &self.resolver)?;
        let mut datasets = self.write_lock();
        datasets.get(&handle).context(UnknownDatasetSnafu { handle })?;
        info!("replace: {} records stored as {}", dataset.len(), handle);
        datasets.insert(handle, Arc::new(dataset));
        Ok(())
    }

    /// A snapshot of the dataset of `handle`.
    pub fn get(&self, handle: DatasetHandle) -> Result<Arc<CanonicalDataset>, RouteError> {
        let datasets = self
            .datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        datasets
            .get(&handle)
            .cloned()
            .context(UnknownDatasetSnafu { handle })
    }

    pub fn remove(&self, handle: DatasetHandle) -> Result<(), RouteError> {
        self.write_lock()
            .remove(&handle)
            .map(|_| ())
            .context(UnknownDatasetSnafu { handle })
    }

    pub fn handles(&self) -> Vec<DatasetHandle> {
        let datasets = self
            .datasets
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut res: Vec<DatasetHandle> = datasets.keys().cloned().collect();
        res.sort();
        res
    }

    /// Builds the routes of a dataset for the raw filter parameters of a
    /// request (ISO dates, exact employee name; empty strings are ignored).
    pub fn generate(
        &self,
        handle: DatasetHandle,
        start_date: Option<&str>,
        end_date: Option<&str>,
        employee: Option<&str>,
    ) -> Result<RouteOutcome, RouteError> {
        let filter = RouteFilter::parse(start_date, end_date, employee)?;
        let dataset = self.get(handle)?;
        debug!("generate: {} with {:?}", handle, filter);
        Ok(crate::generate_routes(&dataset, &filter, &self.render_rules))
    }

    fn write_lock(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<DatasetHandle, Arc<CanonicalDataset>>> {
        // A panic while holding the lock cannot leave a half-written
        // dataset: the map only ever receives complete entries.
        self.datasets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
