pub mod garment;
pub mod product;

use uuid::Uuid;

/// Fresh opaque identity for a newly created record.
pub(crate) fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Trims a submitted text field, treating blank input as absent.
pub(crate) fn present(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|value| !value.is_empty()).map(ToOwned::to_owned)
}
