//! Product catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwright_core::{Price, ProductId, UserId};

/// Largest page size accepted by catalog listings.
pub const MAX_PAGE_SIZE: i64 = 100;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Current unit price. Orders snapshot this at checkout.
    pub price: Price,
    /// Units available. Never negative.
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
    /// Admin who created the product.
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for creating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub stock: i32,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Check field constraints not expressed by the types.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violated constraint.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.trim().is_empty() {
            return Err("name cannot be empty");
        }
        if self.stock < 0 {
            return Err("stock cannot be negative");
        }
        Ok(())
    }
}

/// Partial product update. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    pub stock: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl ProductUpdate {
    /// Check field constraints not expressed by the types.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first violated constraint.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.as_ref().is_some_and(|n| n.trim().is_empty()) {
            return Err("name cannot be empty");
        }
        if self.stock.is_some_and(|s| s < 0) {
            return Err("stock cannot be negative");
        }
        Ok(())
    }

    /// Apply the set fields to `product`.
    pub fn apply(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category = Some(category.clone());
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = Some(image_url.clone());
        }
    }
}

/// Catalog listing filter.
///
/// `keyword` is a case-insensitive substring match over name, description,
/// and category. Results are always ordered by product ID.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub keyword: Option<String>,
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

const fn default_limit() -> i64 {
    MAX_PAGE_SIZE
}

impl ProductFilter {
    /// Filter for a keyword search.
    #[must_use]
    pub fn keyword(keyword: impl Into<String>) -> Self {
        Self {
            keyword: Some(keyword.into()),
            ..Self::default()
        }
        .normalized()
    }

    /// Clamp paging to `0..=MAX_PAGE_SIZE` and drop blank text filters.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.skip = self.skip.max(0);
        self.limit = if self.limit <= 0 {
            MAX_PAGE_SIZE
        } else {
            self.limit.min(MAX_PAGE_SIZE)
        };
        self.category = self.category.filter(|c| !c.trim().is_empty());
        self.keyword = self
            .keyword
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty());
        self
    }

    /// Whether `product` passes every set criterion (paging not included).
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if let Some(category) = &self.category
            && product.category.as_deref() != Some(category.as_str())
        {
            return false;
        }
        if self.min_price.is_some_and(|min| product.price.amount() < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| product.price.amount() > max) {
            return false;
        }
        if let Some(keyword) = &self.keyword {
            let needle = keyword.to_lowercase();
            let hit = |field: Option<&str>| {
                field.is_some_and(|value| value.to_lowercase().contains(&needle))
            };
            if !(hit(Some(&product.name))
                || hit(product.description.as_deref())
                || hit(product.category.as_deref()))
            {
                return false;
            }
        }
        true
    }
}
