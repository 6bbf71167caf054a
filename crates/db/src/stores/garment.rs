use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info};

use factory_core::domain::garment::{Garment, GarmentId, GarmentWithProducts, NewGarment};
use factory_core::domain::product::ProductId;
use factory_core::errors::{ApplicationError, DomainError};

use super::{CascadeReport, CascadeStage, PurgeOutcome};
use crate::repositories::{GarmentRepository, ProductRepository};

#[derive(Clone)]
pub struct GarmentStore {
    garments: Arc<dyn GarmentRepository>,
    products: Arc<dyn ProductRepository>,
}

impl GarmentStore {
    pub fn new(garments: Arc<dyn GarmentRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { garments, products }
    }

    pub async fn create(&self, input: &NewGarment) -> Result<GarmentId, ApplicationError> {
        let fields = input.validate()?;
        let garment = Garment::new(GarmentId::generate(), fields);
        let id = garment.id.clone();

        self.garments.save(garment).await?;
        info!(event_name = "inventory.garment.created", garment_id = %id, "garment created");

        Ok(id)
    }

    pub async fn list(&self) -> Result<Vec<Garment>, ApplicationError> {
        Ok(self.garments.list().await?)
    }

    pub async fn get(&self, id: &GarmentId) -> Result<Garment, ApplicationError> {
        self.garments
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::not_found("garment", id.as_str()).into())
    }

    pub async fn find(&self, id: &GarmentId) -> Result<Option<Garment>, ApplicationError> {
        Ok(self.garments.find_by_id(id).await?)
    }

    pub async fn get_with_products(
        &self,
        id: &GarmentId,
    ) -> Result<GarmentWithProducts, ApplicationError> {
        let garment = self.get(id).await?;
        let products = self.products.find_many(&garment.products).await?;

        if products.len() < garment.products.len() {
            debug!(
                event_name = "inventory.garment.stale_references",
                garment_id = %id,
                references = garment.products.len(),
                resolved = products.len(),
                "garment references products that no longer exist"
            );
        }

        Ok(GarmentWithProducts { garment, products })
    }

    /// Appends a reference in place. A garment removed concurrently stays
    /// removed and the append reports NotFound.
    pub async fn add_product_reference(
        &self,
        garment_id: &GarmentId,
        product_id: &ProductId,
    ) -> Result<(), ApplicationError> {
        if !self.garments.append_reference(garment_id, product_id).await? {
            return Err(DomainError::not_found("garment", garment_id.as_str()).into());
        }

        debug!(
            event_name = "inventory.garment.reference_added",
            garment_id = %garment_id,
            product_id = %product_id,
            "product reference appended to garment"
        );
        Ok(())
    }

    /// Removes the garment, then purges every product it references. The
    /// garment removal is committed before the purge starts and is not rolled
    /// back if the purge fails.
    pub async fn delete(&self, id: &GarmentId) -> Result<CascadeReport, ApplicationError> {
        log_stage(id, CascadeStage::Requested);

        let garment = self
            .garments
            .find_and_delete(id)
            .await?
            .ok_or_else(|| ApplicationError::from(DomainError::not_found("garment", id.as_str())))?;
        log_stage(id, CascadeStage::GarmentRemoved);

        let purge = if garment.products.is_empty() {
            log_stage(id, CascadeStage::PurgeSkipped);
            PurgeOutcome::Skipped
        } else {
            let distinct: HashSet<&ProductId> = garment.products.iter().collect();
            let removed = self.products.delete_many(&garment.products).await.map_err(|err| {
                error!(
                    event_name = "inventory.garment.cascade_failed",
                    garment_id = %id,
                    references = garment.products.len(),
                    error = %err,
                    "garment removed but product purge failed"
                );
                ApplicationError::CascadeIncomplete {
                    garment_id: id.to_string(),
                    reason: err.to_string(),
                }
            })?;
            log_stage(id, CascadeStage::ProductsPurged);
            PurgeOutcome::Purged { removed, stale: (distinct.len() as u64).saturating_sub(removed) }
        };

        log_stage(id, CascadeStage::Complete);
        info!(
            event_name = "inventory.garment.deleted",
            garment_id = %id,
            purged = purge.removed(),
            stale = purge.stale(),
            "garment deleted"
        );

        Ok(CascadeReport { garment, purge })
    }
}

fn log_stage(garment_id: &GarmentId, stage: CascadeStage) {
    debug!(
        event_name = "inventory.garment.cascade_stage",
        garment_id = %garment_id,
        stage = stage.as_str(),
        "garment cascade advanced"
    );
}
