pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;
pub mod stores;

pub use connection::{connect_from_config, connect_with_settings, ping, DbPool};
pub use fixtures::{DemoDataset, GarmentSeedInfo, SeedResult, VerificationResult};
pub use stores::{CascadeReport, CascadeStage, GarmentStore, Inventory, ProductStore, PurgeOutcome};
