pub mod config;
pub mod domain;
pub mod errors;

pub use domain::garment::{Garment, GarmentFields, GarmentId, GarmentWithProducts, NewGarment};
pub use domain::product::{
    Category, NewProduct, Product, ProductFields, ProductId, ProductWithGarment,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
