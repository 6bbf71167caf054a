use std::collections::HashSet;

use tokio::sync::RwLock;

use factory_core::domain::garment::{Garment, GarmentId};
use factory_core::domain::product::{Category, Product, ProductId};

use super::{GarmentRepository, ProductRepository, RepositoryError};

/// Vec-backed so that listing keeps insertion order, matching the SQL store.
#[derive(Default)]
pub struct InMemoryGarmentRepository {
    garments: RwLock<Vec<Garment>>,
}

#[async_trait::async_trait]
impl GarmentRepository for InMemoryGarmentRepository {
    async fn find_by_id(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError> {
        let garments = self.garments.read().await;
        Ok(garments.iter().find(|garment| &garment.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Garment>, RepositoryError> {
        Ok(self.garments.read().await.clone())
    }

    async fn save(&self, garment: Garment) -> Result<(), RepositoryError> {
        let mut garments = self.garments.write().await;
        match garments.iter_mut().find(|existing| existing.id == garment.id) {
            Some(existing) => *existing = garment,
            None => garments.push(garment),
        }
        Ok(())
    }

    async fn append_reference(
        &self,
        id: &GarmentId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let mut garments = self.garments.write().await;
        match garments.iter_mut().find(|garment| &garment.id == id) {
            Some(garment) => {
                garment.add_product(product_id.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_and_delete(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError> {
        let mut garments = self.garments.write().await;
        let position = garments.iter().position(|garment| &garment.id == id);
        Ok(position.map(|index| garments.remove(index)))
    }
}

#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.id == id).cloned())
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| products.iter().find(|product| &product.id == id).cloned())
            .collect())
    }

    async fn list(&self, category: Option<Category>) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products
            .iter()
            .filter(|product| category.is_none() || product.category == category)
            .cloned()
            .collect())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|existing| existing.id == product.id) {
            Some(existing) => *existing = product,
            None => products.push(product),
        }
        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|product| &product.id != id);
        Ok(products.len() < before)
    }

    async fn delete_many(&self, ids: &[ProductId]) -> Result<u64, RepositoryError> {
        let targets: HashSet<&ProductId> = ids.iter().collect();
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|product| !targets.contains(&product.id));
        Ok((before - products.len()) as u64)
    }
}
