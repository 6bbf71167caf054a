use async_trait::async_trait;
use thiserror::Error;

use factory_core::domain::garment::{Garment, GarmentId};
use factory_core::domain::product::{Category, Product, ProductId};
use factory_core::errors::ApplicationError;

pub mod garment;
pub mod memory;
pub mod product;

pub use garment::SqlGarmentRepository;
pub use memory::{InMemoryGarmentRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        ApplicationError::Persistence(value.to_string())
    }
}

#[async_trait]
pub trait GarmentRepository: Send + Sync {
    async fn find_by_id(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError>;

    /// All garments in insertion order.
    async fn list(&self) -> Result<Vec<Garment>, RepositoryError>;

    /// Inserts or replaces the garment, including its product reference list.
    async fn save(&self, garment: Garment) -> Result<(), RepositoryError>;

    /// Appends one product reference to an existing garment. Returns `false`
    /// without writing when the garment is gone.
    async fn append_reference(
        &self,
        id: &GarmentId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError>;

    /// Removes the garment and hands back what was stored, or `None` if it
    /// did not exist.
    async fn find_and_delete(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError>;
}

#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products matching `ids`, in the order given. Unknown ids are skipped;
    /// repeated ids yield repeated products.
    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Products in insertion order, optionally restricted to one category.
    async fn list(&self, category: Option<Category>) -> Result<Vec<Product>, RepositoryError>;

    async fn save(&self, product: Product) -> Result<(), RepositoryError>;

    /// Returns whether a product was removed.
    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError>;

    /// Returns how many products were actually removed; unknown ids are ignored.
    async fn delete_many(&self, ids: &[ProductId]) -> Result<u64, RepositoryError>;
}
