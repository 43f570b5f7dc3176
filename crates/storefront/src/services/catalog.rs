//! Product catalog service.
//!
//! Public browsing plus admin CRUD. Authorization happens before these calls;
//! admin operations take the acting admin's ID only for ownership.

use thiserror::Error;
use tracing::instrument;

use cartwright_core::{ProductId, UserId};

use crate::db::RepositoryError;
use crate::models::{NewProduct, Product, ProductFilter, ProductUpdate};
use crate::store::CatalogStore;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Input failed validation.
    #[error("{0}")]
    Validation(&'static str),

    /// No product with this ID.
    #[error("product not found")]
    NotFound(ProductId),

    /// The product is referenced by an order and cannot be deleted.
    #[error("product {0} is referenced by existing orders")]
    InUse(ProductId),

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Catalog service over any [`CatalogStore`].
pub struct CatalogService<'a, S: ?Sized> {
    store: &'a S,
}

impl<'a, S: CatalogStore + ?Sized> CatalogService<'a, S> {
    /// Create a new catalog service.
    #[must_use]
    pub const fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// List products matching `filter`. Paging is clamped.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Repository` if the query fails.
    pub async fn list(&self, filter: ProductFilter) -> Result<Vec<Product>, CatalogError> {
        Ok(self.store.list_products(&filter.normalized()).await?)
    }

    /// Case-insensitive substring search over name, description and category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a blank keyword.
    pub async fn search(&self, keyword: &str) -> Result<Vec<Product>, CatalogError> {
        let filter = ProductFilter::keyword(keyword);
        if filter.keyword.is_none() {
            return Err(CatalogError::Validation("keyword cannot be empty"));
        }
        Ok(self.store.list_products(&filter).await?)
    }

    /// Get one product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if it does not exist.
    pub async fn get(&self, id: ProductId) -> Result<Product, CatalogError> {
        self.store
            .get_product(id)
            .await?
            .ok_or(CatalogError::NotFound(id))
    }

    /// Create a product owned by `admin`.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for a blank name or negative stock.
    #[instrument(skip(self, new), fields(name = %new.name))]
    pub async fn create(&self, admin: UserId, new: NewProduct) -> Result<Product, CatalogError> {
        new.validate().map_err(CatalogError::Validation)?;
        let product = self.store.create_product(admin, new).await?;
        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` for invalid fields and
    /// `CatalogError::NotFound` if the product does not exist.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: ProductId,
        update: ProductUpdate,
    ) -> Result<Product, CatalogError> {
        update.validate().map_err(CatalogError::Validation)?;
        let product = self
            .store
            .update_product(id, &update)
            .await?
            .ok_or(CatalogError::NotFound(id))?;
        tracing::info!(product_id = %id, "product updated");
        Ok(product)
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if it does not exist and
    /// `CatalogError::InUse` if an order references it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: ProductId) -> Result<(), CatalogError> {
        match self.store.delete_product(id).await {
            Ok(true) => {
                tracing::info!(product_id = %id, "product deleted");
                Ok(())
            }
            Ok(false) => Err(CatalogError::NotFound(id)),
            Err(RepositoryError::Conflict(_)) => Err(CatalogError::InUse(id)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use cartwright_core::{Email, Price, UserRole};
    use rust_decimal::Decimal;

    use super::*;
    use crate::models::NewUser;
    use crate::store::{MemoryStore, UserStore};

    async fn admin(store: &MemoryStore) -> UserId {
        store
            .create_user(NewUser {
                name: "Admin".to_owned(),
                email: Email::parse("admin@shop.test").unwrap(),
                password_hash: "x".to_owned(),
                role: UserRole::Admin,
            })
            .await
            .unwrap()
            .id
    }

    fn new_product(name: &str, category: &str, price: i64) -> NewProduct {
        NewProduct {
            name: name.to_owned(),
            description: None,
            price: Price::new(Decimal::new(price, 0)).unwrap(),
            stock: 10,
            category: Some(category.to_owned()),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_create_validates() {
        let store = MemoryStore::new();
        let admin = admin(&store).await;
        let catalog = CatalogService::new(&store);

        let mut bad = new_product("Mug", "kitchen", 8);
        bad.name = "  ".to_owned();
        assert!(matches!(
            catalog.create(admin, bad).await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_list_filters_and_search() {
        let store = MemoryStore::new();
        let admin = admin(&store).await;
        let catalog = CatalogService::new(&store);
        catalog
            .create(admin, new_product("Mug", "kitchen", 8))
            .await
            .unwrap();
        catalog
            .create(admin, new_product("Desk Lamp", "lighting", 45))
            .await
            .unwrap();
        catalog
            .create(admin, new_product("Teapot", "kitchen", 30))
            .await
            .unwrap();

        let kitchen = catalog
            .list(ProductFilter {
                category: Some("kitchen".to_owned()),
                max_price: Some(Decimal::new(10, 0)),
                ..ProductFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(kitchen.len(), 1);
        assert_eq!(kitchen[0].name, "Mug");

        let lamps = catalog.search("LAMP").await.unwrap();
        assert_eq!(lamps.len(), 1);

        assert!(matches!(
            catalog.search("  ").await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_product() {
        let store = MemoryStore::new();
        let catalog = CatalogService::new(&store);
        let missing = ProductId::new(42);

        assert!(matches!(
            catalog.update(missing, ProductUpdate::default()).await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            catalog.delete(missing).await,
            Err(CatalogError::NotFound(_))
        ));
    }
}
