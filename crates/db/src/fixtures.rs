use std::str::FromStr;

use chrono::Utc;
use rust_decimal::Decimal;

use factory_core::domain::garment::{Garment, GarmentId};
use factory_core::domain::product::{Category, Product, ProductId};
use factory_core::errors::ApplicationError;

use crate::connection::DbPool;
use crate::repositories::{
    GarmentRepository, ProductRepository, SqlGarmentRepository, SqlProductRepository,
};
use crate::stores::Inventory;

/// Deterministic demo inventory. Rows use fixed ids and are upserted, so
/// loading twice leaves the same state as loading once.
const DEMO_GARMENTS: &[DemoGarment] = &[
    DemoGarment {
        id: "demo-garment-summer",
        products_label: "summer-line-products",
        name: "Summer Line",
        location: Some("Bandung"),
        contact: "082xxx",
        products: &[
            DemoProduct {
                id: "demo-product-tshirt",
                name: "T-Shirt",
                brand: "X",
                price: "50000",
                color: "White",
                category: Some(Category::Baju),
            },
            DemoProduct {
                id: "demo-product-chino",
                name: "Chino",
                brand: "X",
                price: "175000",
                color: "Khaki",
                category: Some(Category::Celana),
            },
        ],
    },
    DemoGarment {
        id: "demo-garment-winter",
        products_label: "winter-line-products",
        name: "Winter Line",
        location: None,
        contact: "081yyy",
        products: &[
            DemoProduct {
                id: "demo-product-parka",
                name: "Parka",
                brand: "Northwind",
                price: "450000.50",
                color: "Navy",
                category: Some(Category::Jaket),
            },
            DemoProduct {
                id: "demo-product-beanie",
                name: "Beanie",
                brand: "Northwind",
                price: "35000",
                color: "Grey",
                category: None,
            },
        ],
    },
];

pub struct DemoDataset;

impl DemoDataset {
    pub async fn load(pool: &DbPool) -> Result<SeedResult, ApplicationError> {
        let garments = SqlGarmentRepository::new(pool.clone());
        let products = SqlProductRepository::new(pool.clone());
        let mut seeded = Vec::with_capacity(DEMO_GARMENTS.len());

        for demo in DEMO_GARMENTS {
            let garment_id = GarmentId(demo.id.to_owned());
            let created_at = match garments.find_by_id(&garment_id).await? {
                Some(existing) => existing.created_at,
                None => Utc::now(),
            };

            garments
                .save(Garment {
                    id: garment_id.clone(),
                    name: demo.name.to_owned(),
                    location: demo.location.map(ToOwned::to_owned),
                    contact: demo.contact.to_owned(),
                    products: demo.products.iter().map(|p| ProductId(p.id.to_owned())).collect(),
                    created_at,
                })
                .await?;

            for product in demo.products {
                products.save(product.to_product(&garment_id)?).await?;
            }

            seeded.push(GarmentSeedInfo {
                garment_id: demo.id,
                name: demo.name,
                product_count: demo.products.len(),
            });
        }

        Ok(SeedResult { garments_seeded: seeded })
    }

    /// Checks every demo garment and product through the stores, in both
    /// directions of the association.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, ApplicationError> {
        let inventory = Inventory::new(pool.clone());
        let mut checks = Vec::new();

        for demo in DEMO_GARMENTS {
            let garment_id = GarmentId(demo.id.to_owned());
            let resolved = match inventory.garments.get_with_products(&garment_id).await {
                Ok(resolved) => Some(resolved),
                Err(error) if error.is_not_found() => None,
                Err(error) => return Err(error),
            };
            checks.push((demo.id, resolved.is_some()));

            let expected: Vec<&str> = demo.products.iter().map(|p| p.id).collect();
            let actual: Vec<&str> = resolved
                .as_ref()
                .map(|r| r.products.iter().map(|p| p.id.as_str()).collect())
                .unwrap_or_default();
            checks.push((demo.products_label, actual == expected));

            for product in demo.products {
                let owner = match inventory
                    .products
                    .get_with_garment(&ProductId(product.id.to_owned()))
                    .await
                {
                    Ok(resolved) => resolved.garment.map(|garment| garment.id),
                    Err(error) if error.is_not_found() => None,
                    Err(error) => return Err(error),
                };
                checks.push((product.id, owner.as_ref() == Some(&garment_id)));
            }
        }

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo garments through the cascading delete.
    pub async fn clean(pool: &DbPool) -> Result<(), ApplicationError> {
        let inventory = Inventory::new(pool.clone());
        for demo in DEMO_GARMENTS {
            match inventory.garments.delete(&GarmentId(demo.id.to_owned())).await {
                Ok(_) => {}
                Err(error) if error.is_not_found() => {}
                Err(error) => return Err(error),
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct DemoGarment {
    id: &'static str,
    /// Check name for the garment's resolved product list.
    products_label: &'static str,
    name: &'static str,
    location: Option<&'static str>,
    contact: &'static str,
    products: &'static [DemoProduct],
}

#[derive(Debug, Clone, Copy)]
struct DemoProduct {
    id: &'static str,
    name: &'static str,
    brand: &'static str,
    price: &'static str,
    color: &'static str,
    category: Option<Category>,
}

impl DemoProduct {
    fn to_product(self, garment_id: &GarmentId) -> Result<Product, ApplicationError> {
        let price = Decimal::from_str(self.price)
            .map_err(|e| ApplicationError::Configuration(format!("demo price `{}`: {e}", self.price)))?;
        Ok(Product {
            id: ProductId(self.id.to_owned()),
            name: self.name.to_owned(),
            brand: self.brand.to_owned(),
            price,
            color: self.color.to_owned(),
            category: self.category,
            garment_id: garment_id.clone(),
            created_at: Utc::now(),
        })
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub garments_seeded: Vec<GarmentSeedInfo>,
}

impl SeedResult {
    pub fn product_count(&self) -> usize {
        self.garments_seeded.iter().map(|info| info.product_count).sum()
    }
}

#[derive(Debug)]
pub struct GarmentSeedInfo {
    pub garment_id: &'static str,
    pub name: &'static str,
    pub product_count: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
