use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::garment::{Garment, GarmentId};
use crate::domain::{generate_id, present};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn generate() -> Self {
        Self(generate_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProductId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed product classification. The stored and displayed values are the
/// literal strings below and are matched case-sensitively.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Baju,
    Celana,
    Aksesoris,
    Jaket,
}

impl Category {
    pub const ALL: [Category; 4] =
        [Category::Baju, Category::Celana, Category::Aksesoris, Category::Jaket];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Baju => "Baju",
            Self::Celana => "Celana",
            Self::Aksesoris => "Aksesoris",
            Self::Jaket => "Jaket",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|category| category.as_str() == value).ok_or_else(|| {
            DomainError::InvalidField {
                field: "category",
                reason: format!("`{value}` is not one of Baju|Celana|Aksesoris|Jaket"),
            }
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub brand: String,
    pub price: Decimal,
    pub color: String,
    pub category: Option<Category>,
    pub garment_id: GarmentId,
    pub created_at: DateTime<Utc>,
}

/// Raw product fields as submitted by a caller. `garment` is only read by the
/// standalone create path; the nested path takes the garment from the route.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NewProduct {
    pub name: Option<String>,
    pub brand: Option<String>,
    pub price: Option<String>,
    pub color: Option<String>,
    pub category: Option<String>,
    pub garment: Option<String>,
}

/// Product fields that passed validation, not yet bound to a garment.
#[derive(Clone, Debug, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub brand: String,
    pub price: Decimal,
    pub color: String,
    pub category: Option<Category>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<ProductFields, DomainError> {
        let name = present(self.name.as_deref()).ok_or(DomainError::MissingField("name"))?;
        let brand = present(self.brand.as_deref()).ok_or(DomainError::MissingField("brand"))?;
        let raw_price =
            present(self.price.as_deref()).ok_or(DomainError::MissingField("price"))?;
        let price = Decimal::from_str(&raw_price).map_err(|error| DomainError::InvalidField {
            field: "price",
            reason: format!("`{raw_price}` is not a number ({error})"),
        })?;
        let color = present(self.color.as_deref()).ok_or(DomainError::MissingField("color"))?;
        let category =
            present(self.category.as_deref()).map(|value| value.parse::<Category>()).transpose()?;

        Ok(ProductFields { name, brand, price, color, category })
    }

    pub fn garment_reference(&self) -> Result<GarmentId, DomainError> {
        present(self.garment.as_deref()).map(GarmentId).ok_or(DomainError::MissingField("garment"))
    }
}

impl Product {
    pub fn new(id: ProductId, fields: ProductFields, garment_id: GarmentId) -> Self {
        Self {
            id,
            name: fields.name,
            brand: fields.brand,
            price: fields.price,
            color: fields.color,
            category: fields.category,
            garment_id,
            created_at: Utc::now(),
        }
    }
}

/// A product with its owning garment resolved. `garment` is `None` when the
/// product outlived its garment.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProductWithGarment {
    pub product: Product,
    pub garment: Option<Garment>,
}
