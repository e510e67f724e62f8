//! Repository ports for projected records
//!
//! Projection writes records through these traits so that callers decide
//! where they end up. [`InMemoryRepository`] backs them with a vector and is
//! what the CLI uses for dry runs.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use crate::error::RepositoryError;
use crate::model::{App, AppBox, Cluster, Provider, Workspace};

/// Storage for workspace records
#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, workspace: Workspace) -> Result<(), RepositoryError>;

    /// All stored records
    async fn list(&self) -> Result<Vec<Workspace>, RepositoryError>;
}

/// Storage for provider records
#[async_trait]
pub trait ProviderRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, provider: Provider) -> Result<(), RepositoryError>;

    /// All stored records
    async fn list(&self) -> Result<Vec<Provider>, RepositoryError>;
}

/// Storage for cluster records
#[async_trait]
pub trait ClusterRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, cluster: Cluster) -> Result<(), RepositoryError>;

    /// All stored records
    async fn list(&self) -> Result<Vec<Cluster>, RepositoryError>;
}

/// Storage for app records
#[async_trait]
pub trait AppRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, app: App) -> Result<(), RepositoryError>;

    /// All stored records
    async fn list(&self) -> Result<Vec<App>, RepositoryError>;
}

/// Storage for box records
#[async_trait]
pub trait BoxRepository: Send + Sync {
    /// Persist a new record
    async fn create(&self, app_box: AppBox) -> Result<(), RepositoryError>;

    /// All stored records
    async fn list(&self) -> Result<Vec<AppBox>, RepositoryError>;
}

/// The set of ports projection writes to.
///
/// Boxes are only projected when `box_` is set.
#[derive(Clone)]
pub struct Repositories {
    /// Workspace port
    pub workspace: Arc<dyn WorkspaceRepository>,
    /// Provider port
    pub provider: Arc<dyn ProviderRepository>,
    /// Cluster port
    pub cluster: Arc<dyn ClusterRepository>,
    /// App port
    pub app: Arc<dyn AppRepository>,
    /// Optional box port
    pub box_: Option<Arc<dyn BoxRepository>>,
}

impl Repositories {
    /// Fresh in-memory ports for every kind, boxes included
    pub fn in_memory() -> Self {
        Self {
            workspace: Arc::new(InMemoryRepository::<Workspace>::default()),
            provider: Arc::new(InMemoryRepository::<Provider>::default()),
            cluster: Arc::new(InMemoryRepository::<Cluster>::default()),
            app: Arc::new(InMemoryRepository::<App>::default()),
            box_: Some(Arc::new(InMemoryRepository::<AppBox>::default())),
        }
    }
}

/// Records keyed by their FQN string
pub trait Record: Clone + Send + Sync {
    /// FQN string of the record
    fn id(&self) -> &str;
}

macro_rules! impl_record {
    ($($ty:ty),*) => {
        $(impl Record for $ty {
            fn id(&self) -> &str {
                &self.id
            }
        })*
    };
}

impl_record!(Workspace, Provider, Cluster, App, AppBox);

/// Vector-backed repository; rejects a second record with the same id.
#[derive(Debug)]
pub struct InMemoryRepository<T> {
    records: Mutex<Vec<T>>,
}

impl<T> Default for InMemoryRepository<T> {
    fn default() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }
}

impl<T: Record> InMemoryRepository<T> {
    fn insert(&self, record: T) -> Result<(), RepositoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::from("repository lock poisoned"))?;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(format!("record {:?} already exists", record.id()).into());
        }
        records.push(record);
        Ok(())
    }

    fn snapshot(&self) -> Result<Vec<T>, RepositoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| RepositoryError::from("repository lock poisoned"))?;
        Ok(records.clone())
    }
}

macro_rules! impl_in_memory {
    ($trait:ident, $ty:ty) => {
        #[async_trait]
        impl $trait for InMemoryRepository<$ty> {
            async fn create(&self, record: $ty) -> Result<(), RepositoryError> {
                self.insert(record)
            }

            async fn list(&self) -> Result<Vec<$ty>, RepositoryError> {
                self.snapshot()
            }
        }
    };
}

impl_in_memory!(WorkspaceRepository, Workspace);
impl_in_memory!(ProviderRepository, Provider);
impl_in_memory!(ClusterRepository, Cluster);
impl_in_memory!(AppRepository, App);
impl_in_memory!(BoxRepository, AppBox);
