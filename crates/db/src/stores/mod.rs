//! Garment and product stores.
//!
//! Both stores share one pair of repositories. The garment store owns the
//! cascading delete; the product store goes through the garment store when a
//! product is created under a garment so that the reference list and the
//! product's back-reference are written by one code path.

use std::sync::Arc;

use serde::Serialize;

use factory_core::domain::garment::Garment;

use crate::repositories::{
    GarmentRepository, InMemoryGarmentRepository, InMemoryProductRepository, ProductRepository,
    SqlGarmentRepository, SqlProductRepository,
};
use crate::DbPool;

pub mod garment;
pub mod product;

pub use garment::GarmentStore;
pub use product::ProductStore;

/// Stages of a garment delete, in order. There is no rollback stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeStage {
    Requested,
    GarmentRemoved,
    ProductsPurged,
    PurgeSkipped,
    Complete,
}

impl CascadeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::GarmentRemoved => "garment_removed",
            Self::ProductsPurged => "products_purged",
            Self::PurgeSkipped => "purge_skipped",
            Self::Complete => "complete",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PurgeOutcome {
    /// The garment referenced no products.
    Skipped,
    /// `stale` counts distinct references whose product was already gone.
    Purged { removed: u64, stale: u64 },
}

impl PurgeOutcome {
    pub fn removed(&self) -> u64 {
        match self {
            Self::Skipped => 0,
            Self::Purged { removed, .. } => *removed,
        }
    }

    pub fn stale(&self) -> u64 {
        match self {
            Self::Skipped => 0,
            Self::Purged { stale, .. } => *stale,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CascadeReport {
    pub garment: Garment,
    pub purge: PurgeOutcome,
}

/// Both stores wired to the same storage handle.
#[derive(Clone)]
pub struct Inventory {
    pub garments: GarmentStore,
    pub products: ProductStore,
}

impl Inventory {
    pub fn new(pool: DbPool) -> Self {
        Self::with_repositories(
            Arc::new(SqlGarmentRepository::new(pool.clone())),
            Arc::new(SqlProductRepository::new(pool)),
        )
    }

    pub fn in_memory() -> Self {
        Self::with_repositories(
            Arc::new(InMemoryGarmentRepository::default()),
            Arc::new(InMemoryProductRepository::default()),
        )
    }

    pub fn with_repositories(
        garment_repo: Arc<dyn GarmentRepository>,
        product_repo: Arc<dyn ProductRepository>,
    ) -> Self {
        let garments = GarmentStore::new(garment_repo, product_repo.clone());
        let products = ProductStore::new(product_repo, garments.clone());
        Self { garments, products }
    }
}
