use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::product::{Product, ProductId};
use crate::domain::{generate_id, present};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GarmentId(pub String);

impl GarmentId {
    pub fn generate() -> Self {
        Self(generate_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GarmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A production batch or collection. `products` is the ordered list of
/// product references; it may hold duplicates or ids whose product is gone.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Garment {
    pub id: GarmentId,
    pub name: String,
    pub location: Option<String>,
    pub contact: String,
    pub products: Vec<ProductId>,
    pub created_at: DateTime<Utc>,
}

/// Raw garment fields as submitted by a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct NewGarment {
    pub name: Option<String>,
    pub location: Option<String>,
    pub contact: Option<String>,
}

/// Garment fields that passed validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GarmentFields {
    pub name: String,
    pub location: Option<String>,
    pub contact: String,
}

impl NewGarment {
    pub fn validate(&self) -> Result<GarmentFields, DomainError> {
        let name = present(self.name.as_deref()).ok_or(DomainError::MissingField("name"))?;
        let contact =
            present(self.contact.as_deref()).ok_or(DomainError::MissingField("contact"))?;

        Ok(GarmentFields { name, location: present(self.location.as_deref()), contact })
    }
}

impl Garment {
    pub fn new(id: GarmentId, fields: GarmentFields) -> Self {
        Self {
            id,
            name: fields.name,
            location: fields.location,
            contact: fields.contact,
            products: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn add_product(&mut self, product_id: ProductId) {
        self.products.push(product_id);
    }
}

/// A garment with its product references resolved. Products appear in
/// reference order; references without a stored product are left out.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GarmentWithProducts {
    pub garment: Garment,
    pub products: Vec<Product>,
}
