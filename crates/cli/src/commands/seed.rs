//! Seed the catalog from a YAML file.
//!
//! ```yaml
//! products:
//!   - name: Enamel Mug
//!     description: 350 ml, dishwasher safe
//!     price: "12.50"
//!     stock: 40
//!     category: kitchen
//! ```
//!
//! Every product is validated before anything is written.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use cartwright_core::{Email, UserRole};
use cartwright_storefront::models::NewProduct;
use cartwright_storefront::services::catalog::CatalogService;
use cartwright_storefront::store::UserStore;

use super::{CliError, connect};

/// Seed file layout.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub products: Vec<NewProduct>,
}

/// Parse and validate a seed document.
///
/// # Errors
///
/// Returns `CliError::Yaml` for malformed YAML and `CliError::InvalidSeed`
/// if any product fails validation.
pub fn parse(content: &str) -> Result<CatalogSeed, CliError> {
    let seed: CatalogSeed = serde_yaml::from_str(content)?;

    let mut invalid = 0;
    for (index, product) in seed.products.iter().enumerate() {
        if let Err(reason) = product.validate() {
            error!("  - product #{} ({}): {reason}", index + 1, product.name);
            invalid += 1;
        }
    }

    if invalid > 0 {
        return Err(CliError::InvalidSeed(invalid));
    }
    Ok(seed)
}

/// Load products from `file_path`, owned by the admin account `owner`.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, the owner is not
/// an admin account, or a database operation fails.
pub async fn products(file_path: &str, owner: &str) -> Result<usize, CliError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let seed = parse(&content)?;
    info!(products = seed.products.len(), "Seed file validated");

    let owner = Email::parse(owner)?;
    let store = connect().await?;
    let admin = store
        .find_user(&owner, UserRole::Admin)
        .await?
        .ok_or_else(|| CliError::UserNotFound {
            email: owner.to_string(),
            role: UserRole::Admin,
        })?;

    let catalog = CatalogService::new(&store);
    let mut created = 0;
    for product in seed.products {
        catalog.create(admin.id, product).await?;
        created += 1;
    }

    info!("Seeding complete! Products created: {created}");
    Ok(created)
}
