use std::sync::Arc;

use tracing::{debug, info};

use factory_core::domain::garment::GarmentId;
use factory_core::domain::product::{Category, NewProduct, Product, ProductId, ProductWithGarment};
use factory_core::errors::{ApplicationError, DomainError};

use super::GarmentStore;
use crate::repositories::ProductRepository;

#[derive(Clone)]
pub struct ProductStore {
    products: Arc<dyn ProductRepository>,
    garments: GarmentStore,
}

impl ProductStore {
    pub fn new(products: Arc<dyn ProductRepository>, garments: GarmentStore) -> Self {
        Self { products, garments }
    }

    /// Creates a product from a submission that names its garment. The
    /// garment's reference list is left untouched.
    pub async fn create(&self, input: &NewProduct) -> Result<ProductId, ApplicationError> {
        let fields = input.validate()?;
        let garment_id = input.garment_reference()?;
        self.garments.get(&garment_id).await?;

        let product = Product::new(ProductId::generate(), fields, garment_id);
        let id = product.id.clone();
        let garment_id = product.garment_id.clone();
        self.products.save(product).await?;

        info!(
            event_name = "inventory.product.created",
            product_id = %id,
            garment_id = %garment_id,
            "product created"
        );
        Ok(id)
    }

    /// Creates a product owned by `garment_id` and appends it to the garment's
    /// reference list. The garment is persisted before the product; a failure
    /// in between leaves a dangling reference that resolution skips.
    pub async fn create_under_garment(
        &self,
        garment_id: &GarmentId,
        input: &NewProduct,
    ) -> Result<ProductId, ApplicationError> {
        let fields = input.validate()?;
        let garment = self.garments.get(garment_id).await?;

        let product = Product::new(ProductId::generate(), fields, garment.id.clone());
        let id = product.id.clone();
        self.garments.add_product_reference(&garment.id, &id).await?;
        self.products.save(product).await?;

        info!(
            event_name = "inventory.product.created_under_garment",
            product_id = %id,
            garment_id = %garment_id,
            "product created under garment"
        );
        Ok(id)
    }

    /// Lists products, optionally filtered by an exact category name. An empty
    /// filter means no filter; a name outside the category set matches nothing.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Product>, ApplicationError> {
        match category.filter(|value| !value.is_empty()) {
            None => Ok(self.products.list(None).await?),
            Some(value) => match value.parse::<Category>() {
                Ok(category) => Ok(self.products.list(Some(category)).await?),
                Err(_) => {
                    debug!(
                        event_name = "inventory.product.unknown_category_filter",
                        category = value,
                        "category filter matches no known category"
                    );
                    Ok(Vec::new())
                }
            },
        }
    }

    pub async fn get_with_garment(
        &self,
        id: &ProductId,
    ) -> Result<ProductWithGarment, ApplicationError> {
        let product = self
            .products
            .find_by_id(id)
            .await?
            .ok_or_else(|| ApplicationError::from(DomainError::not_found("product", id.as_str())))?;
        let garment = self.garments.find(&product.garment_id).await?;

        if garment.is_none() {
            debug!(
                event_name = "inventory.product.orphaned",
                product_id = %id,
                garment_id = %product.garment_id,
                "product references a garment that no longer exists"
            );
        }

        Ok(ProductWithGarment { product, garment })
    }

    pub async fn delete_many(&self, ids: &[ProductId]) -> Result<u64, ApplicationError> {
        Ok(self.products.delete_many(ids).await?)
    }

    /// Removes one product. The owning garment keeps its (now stale) reference.
    pub async fn delete(&self, id: &ProductId) -> Result<(), ApplicationError> {
        if !self.products.delete(id).await? {
            return Err(DomainError::not_found("product", id.as_str()).into());
        }

        info!(event_name = "inventory.product.deleted", product_id = %id, "product deleted");
        Ok(())
    }
}
