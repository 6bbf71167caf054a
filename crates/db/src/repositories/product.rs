use std::collections::{BTreeSet, HashMap};
use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};

use factory_core::domain::garment::GarmentId;
use factory_core::domain::product::{Category, Product, ProductId};

use super::garment::parse_timestamp;
use super::{ProductRepository, RepositoryError};
use crate::DbPool;

const PRODUCT_COLUMNS: &str = "id, name, brand, price, color, category, garment_id, created_at";

pub struct SqlProductRepository {
    pool: DbPool,
}

impl SqlProductRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_product(row: &SqliteRow) -> Result<Product, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let brand: String = row.try_get("brand").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let price_str: String =
        row.try_get("price").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let color: String = row.try_get("color").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let category_str: Option<String> =
        row.try_get("category").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let garment_id: String =
        row.try_get("garment_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let price = Decimal::from_str(&price_str)
        .map_err(|e| RepositoryError::Decode(format!("product.price `{price_str}`: {e}")))?;
    let category = category_str
        .map(|value| value.parse::<Category>())
        .transpose()
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Product {
        id: ProductId(id),
        name,
        brand,
        price,
        color,
        category,
        garment_id: GarmentId(garment_id),
        created_at: parse_timestamp("product.created_at", &created_at_str)?,
    })
}

fn distinct_ids(ids: &[ProductId]) -> BTreeSet<String> {
    ids.iter().map(|id| id.0.clone()).collect()
}

#[async_trait::async_trait]
impl ProductRepository for SqlProductRepository {
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_product(r)?)),
            None => Ok(None),
        }
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let wanted = distinct_ids(ids);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id IN ("));
        let mut separated = query_builder.separated(", ");
        for id in wanted {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let rows: Vec<SqliteRow> = query_builder.build().fetch_all(&self.pool).await?;
        let mut found = HashMap::with_capacity(rows.len());
        for row in &rows {
            let product = row_to_product(row)?;
            found.insert(product.id.0.clone(), product);
        }

        Ok(ids.iter().filter_map(|id| found.get(&id.0).cloned()).collect())
    }

    async fn list(&self, category: Option<Category>) -> Result<Vec<Product>, RepositoryError> {
        let rows: Vec<SqliteRow> = if let Some(category) = category {
            sqlx::query(&format!(
                "SELECT {PRODUCT_COLUMNS} FROM product WHERE category = ? ORDER BY rowid ASC"
            ))
            .bind(category.as_str())
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM product ORDER BY rowid ASC"))
                .fetch_all(&self.pool)
                .await?
        };

        rows.iter().map(row_to_product).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO product (id, name, brand, price, color, category, garment_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 brand = excluded.brand,
                 price = excluded.price,
                 color = excluded.color,
                 category = excluded.category",
        )
        .bind(&product.id.0)
        .bind(&product.name)
        .bind(&product.brand)
        .bind(product.price.to_string())
        .bind(&product.color)
        .bind(product.category.map(|category| category.as_str()))
        .bind(&product.garment_id.0)
        .bind(product.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let result =
            sqlx::query("DELETE FROM product WHERE id = ?").bind(&id.0).execute(&self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_many(&self, ids: &[ProductId]) -> Result<u64, RepositoryError> {
        let targets = distinct_ids(ids);
        if targets.is_empty() {
            return Ok(0);
        }

        let mut query_builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM product WHERE id IN (");
        let mut separated = query_builder.separated(", ");
        for id in targets {
            separated.push_bind(id);
        }
        separated.push_unseparated(")");

        let result = query_builder.build().execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use factory_core::domain::garment::GarmentId;
    use factory_core::domain::product::{Category, Product, ProductId};

    use super::SqlProductRepository;
    use crate::repositories::ProductRepository;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlProductRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlProductRepository::new(pool)
    }

    fn sample_product(id: &str, category: Option<Category>) -> Product {
        Product {
            id: ProductId(id.to_string()),
            name: "T-Shirt".to_string(),
            brand: "X".to_string(),
            price: Decimal::new(5_000_050, 2),
            color: "White".to_string(),
            category,
            garment_id: GarmentId("G-1".to_string()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn save_and_find_by_id_preserves_decimal_price() {
        let repo = setup().await;
        let product = sample_product("P-1", Some(Category::Baju));

        repo.save(product.clone()).await.expect("save");
        let found = repo.find_by_id(&product.id).await.expect("find").expect("present");

        assert_eq!(found.price, Decimal::new(5_000_050, 2));
        assert_eq!(found.category, Some(Category::Baju));
        assert_eq!(found.garment_id, GarmentId("G-1".to_string()));
    }

    #[tokio::test]
    async fn product_without_category_round_trips_as_none() {
        let repo = setup().await;
        repo.save(sample_product("P-1", None)).await.expect("save");

        let found =
            repo.find_by_id(&ProductId("P-1".to_string())).await.expect("find").expect("present");

        assert_eq!(found.category, None);
    }

    #[tokio::test]
    async fn list_filters_by_exact_category() {
        let repo = setup().await;
        repo.save(sample_product("P-1", Some(Category::Baju))).await.expect("save 1");
        repo.save(sample_product("P-2", Some(Category::Celana))).await.expect("save 2");
        repo.save(sample_product("P-3", Some(Category::Baju))).await.expect("save 3");

        let baju = repo.list(Some(Category::Baju)).await.expect("list baju");
        let ids: Vec<&str> = baju.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P-1", "P-3"]);

        assert!(repo.list(Some(Category::Jaket)).await.expect("list jaket").is_empty());
        assert_eq!(repo.list(None).await.expect("list all").len(), 3);
    }

    #[tokio::test]
    async fn find_many_follows_requested_order_and_skips_unknown_ids() {
        let repo = setup().await;
        repo.save(sample_product("P-1", None)).await.expect("save 1");
        repo.save(sample_product("P-2", None)).await.expect("save 2");

        let found = repo
            .find_many(&[
                ProductId("P-2".to_string()),
                ProductId("P-gone".to_string()),
                ProductId("P-1".to_string()),
            ])
            .await
            .expect("find many");

        let ids: Vec<&str> = found.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["P-2", "P-1"]);
        assert!(repo.find_many(&[]).await.expect("empty").is_empty());
    }

    #[tokio::test]
    async fn delete_many_counts_only_rows_that_existed() {
        let repo = setup().await;
        repo.save(sample_product("P-1", None)).await.expect("save 1");
        repo.save(sample_product("P-2", None)).await.expect("save 2");
        repo.save(sample_product("P-3", None)).await.expect("save 3");

        let removed = repo
            .delete_many(&[
                ProductId("P-1".to_string()),
                ProductId("P-1".to_string()),
                ProductId("P-missing".to_string()),
                ProductId("P-3".to_string()),
            ])
            .await
            .expect("delete many");

        assert_eq!(removed, 2);
        let remaining = repo.list(None).await.expect("list");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id.as_str(), "P-2");
        assert_eq!(repo.delete_many(&[]).await.expect("empty delete"), 0);
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_was_removed() {
        let repo = setup().await;
        repo.save(sample_product("P-1", None)).await.expect("save");

        assert!(repo.delete(&ProductId("P-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&ProductId("P-1".to_string())).await.expect("delete again"));
    }
}
