use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use factory_core::domain::garment::{Garment, GarmentId};
use factory_core::domain::product::ProductId;

use super::{GarmentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlGarmentRepository {
    pool: DbPool,
}

impl SqlGarmentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{field} `{value}` is not RFC 3339: {e}")))
}

fn row_to_garment(row: &SqliteRow, products: Vec<ProductId>) -> Result<Garment, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let location: Option<String> =
        row.try_get("location").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let contact: String =
        row.try_get("contact").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Garment {
        id: GarmentId(id),
        name,
        location,
        contact,
        products,
        created_at: parse_timestamp("garment.created_at", &created_at_str)?,
    })
}

async fn product_references<'e, E>(
    executor: E,
    garment_id: &str,
) -> Result<Vec<ProductId>, RepositoryError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let references: Vec<String> = sqlx::query_scalar(
        "SELECT product_id FROM garment_product WHERE garment_id = ? ORDER BY position ASC",
    )
    .bind(garment_id)
    .fetch_all(executor)
    .await?;

    Ok(references.into_iter().map(ProductId).collect())
}

#[async_trait::async_trait]
impl GarmentRepository for SqlGarmentRepository {
    async fn find_by_id(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError> {
        let row = sqlx::query("SELECT id, name, location, contact, created_at FROM garment WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let products = product_references(&self.pool, &id.0).await?;
                Ok(Some(row_to_garment(r, products)?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self) -> Result<Vec<Garment>, RepositoryError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, name, location, contact, created_at FROM garment ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let reference_rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT garment_id, product_id FROM garment_product ORDER BY garment_id, position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut references: HashMap<String, Vec<ProductId>> = HashMap::new();
        for (garment_id, product_id) in reference_rows {
            references.entry(garment_id).or_default().push(ProductId(product_id));
        }

        rows.iter()
            .map(|row| {
                let id: String =
                    row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
                row_to_garment(row, references.remove(&id).unwrap_or_default())
            })
            .collect()
    }

    async fn save(&self, garment: Garment) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO garment (id, name, location, contact, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 location = excluded.location,
                 contact = excluded.contact",
        )
        .bind(&garment.id.0)
        .bind(&garment.name)
        .bind(&garment.location)
        .bind(&garment.contact)
        .bind(garment.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM garment_product WHERE garment_id = ?")
            .bind(&garment.id.0)
            .execute(&mut *tx)
            .await?;

        for (position, product_id) in garment.products.iter().enumerate() {
            sqlx::query(
                "INSERT INTO garment_product (garment_id, position, product_id) VALUES (?, ?, ?)",
            )
            .bind(&garment.id.0)
            .bind(position as i64)
            .bind(&product_id.0)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn append_reference(
        &self,
        id: &GarmentId,
        product_id: &ProductId,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "INSERT INTO garment_product (garment_id, position, product_id)
             SELECT ?1,
                    COALESCE((SELECT MAX(position) + 1 FROM garment_product WHERE garment_id = ?1), 0),
                    ?2
             WHERE EXISTS (SELECT 1 FROM garment WHERE id = ?1)",
        )
        .bind(&id.0)
        .bind(&product_id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_and_delete(&self, id: &GarmentId) -> Result<Option<Garment>, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT id, name, location, contact, created_at FROM garment WHERE id = ?")
            .bind(&id.0)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };

        let products = product_references(&mut *tx, &id.0).await?;
        let garment = row_to_garment(&row, products)?;

        sqlx::query("DELETE FROM garment_product WHERE garment_id = ?")
            .bind(&id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM garment WHERE id = ?").bind(&id.0).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(Some(garment))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use factory_core::domain::garment::{Garment, GarmentId};
    use factory_core::domain::product::ProductId;

    use super::SqlGarmentRepository;
    use crate::repositories::GarmentRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_garment(id: &str, name: &str) -> Garment {
        Garment {
            id: GarmentId(id.to_string()),
            name: name.to_string(),
            location: Some("Bandung".to_string()),
            contact: "082xxx".to_string(),
            products: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id_keeps_reference_order() {
        let repo = SqlGarmentRepository::new(setup().await);
        let mut garment = sample_garment("G-1", "Summer Line");
        garment.products =
            vec![ProductId("P-2".to_string()), ProductId("P-1".to_string()), ProductId("P-2".to_string())];

        repo.save(garment.clone()).await.expect("save");
        let found = repo.find_by_id(&garment.id).await.expect("find").expect("present");

        assert_eq!(found.name, "Summer Line");
        assert_eq!(found.location.as_deref(), Some("Bandung"));
        assert_eq!(found.products, garment.products);
    }

    #[tokio::test]
    async fn find_by_id_returns_none_for_unknown_garment() {
        let repo = SqlGarmentRepository::new(setup().await);

        let found = repo.find_by_id(&GarmentId("G-missing".to_string())).await.expect("find");

        assert!(found.is_none());
    }

    #[tokio::test]
    async fn append_reference_adds_to_end_of_existing_list() {
        let repo = SqlGarmentRepository::new(setup().await);
        let mut garment = sample_garment("G-1", "Summer Line");
        garment.products = vec![ProductId("P-1".to_string())];
        repo.save(garment.clone()).await.expect("save");

        let appended =
            repo.append_reference(&garment.id, &ProductId("P-2".to_string())).await.expect("append");
        let found = repo.find_by_id(&garment.id).await.expect("find").expect("present");

        assert!(appended);
        assert_eq!(found.products, vec![ProductId("P-1".to_string()), ProductId("P-2".to_string())]);
    }

    #[tokio::test]
    async fn append_reference_to_missing_garment_writes_nothing() {
        let pool = setup().await;
        let repo = SqlGarmentRepository::new(pool.clone());

        let appended = repo
            .append_reference(&GarmentId("G-gone".to_string()), &ProductId("P-1".to_string()))
            .await
            .expect("append");
        let references: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM garment_product")
            .fetch_one(&pool)
            .await
            .expect("count");

        assert!(!appended);
        assert_eq!(references, 0);
        assert!(repo.list().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn save_replaces_reference_list_on_update() {
        let repo = SqlGarmentRepository::new(setup().await);
        let mut garment = sample_garment("G-1", "Summer Line");
        garment.products = vec![ProductId("P-1".to_string())];
        repo.save(garment.clone()).await.expect("first save");

        garment.products.push(ProductId("P-2".to_string()));
        garment.contact = "081yyy".to_string();
        repo.save(garment.clone()).await.expect("second save");

        let found = repo.find_by_id(&garment.id).await.expect("find").expect("present");
        assert_eq!(found.contact, "081yyy");
        assert_eq!(
            found.products,
            vec![ProductId("P-1".to_string()), ProductId("P-2".to_string())]
        );
        assert_eq!(repo.list().await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn list_returns_insertion_order_with_references() {
        let repo = SqlGarmentRepository::new(setup().await);
        let mut first = sample_garment("G-b", "Winter Line");
        first.products = vec![ProductId("P-9".to_string())];
        repo.save(first).await.expect("save first");
        repo.save(sample_garment("G-a", "Summer Line")).await.expect("save second");

        let garments = repo.list().await.expect("list");

        let names: Vec<&str> = garments.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Winter Line", "Summer Line"]);
        assert_eq!(garments[0].products, vec![ProductId("P-9".to_string())]);
        assert!(garments[1].products.is_empty());
    }

    #[tokio::test]
    async fn find_and_delete_returns_removed_garment_and_clears_references() {
        let pool = setup().await;
        let repo = SqlGarmentRepository::new(pool.clone());
        let mut garment = sample_garment("G-1", "Summer Line");
        garment.products = vec![ProductId("P-1".to_string())];
        repo.save(garment.clone()).await.expect("save");

        let removed = repo.find_and_delete(&garment.id).await.expect("delete").expect("present");
        assert_eq!(removed.products, garment.products);
        assert!(repo.find_by_id(&garment.id).await.expect("find").is_none());

        let (leftover,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM garment_product WHERE garment_id = 'G-1'")
                .fetch_one(&pool)
                .await
                .expect("count references");
        assert_eq!(leftover, 0);

        let again = repo.find_and_delete(&garment.id).await.expect("second delete");
        assert!(again.is_none());
    }
}
