//! Seed the catalog with products from a YAML file.
//!
//! Products are upserted by name, so the same file can be applied repeatedly
//! to update prices.
//!
//! ```yaml
//! products:
//!   - name: Fone Bluetooth
//!     price: "199.90"
//!     category: audio
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info};

use stg_catalog_storefront::db::{self, NewProduct, ProductRepository};

use super::database_url;

/// Top-level structure of a product seed file.
#[derive(Debug, Deserialize)]
pub struct ProductsFile {
    pub products: Vec<NewProduct>,
}

/// Check a parsed seed file, returning one message per problem.
pub fn validate(file: &ProductsFile) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (index, product) in file.products.iter().enumerate() {
        let name = product.name.trim();
        if name.is_empty() {
            errors.push(format!("product #{} has an empty name", index + 1));
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            errors.push(format!("duplicate product name: {name}"));
        }
        if product.price.amount().is_sign_negative() {
            errors.push(format!("negative price for {name}"));
        }
    }

    errors
}

/// Upsert products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails validation, or if a
/// database operation fails.
pub async fn products(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading products from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let file: ProductsFile = serde_yaml::from_str(&content)?;

    let errors = validate(&file);
    if !errors.is_empty() {
        error!("Product file validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(format!("{} validation errors found", errors.len()).into());
    }

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let repo = ProductRepository::new(&pool);
    for product in &file.products {
        let saved = repo.upsert(product).await?;
        info!(id = %saved.id, name = %saved.name, price = %saved.price, "Product saved");
    }

    info!("Seeding complete! {} products upserted", file.products.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ProductsFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_valid_file() {
        let file = parse(
            r#"
products:
  - name: Fone Bluetooth
    price: "199.90"
    category: audio
  - name: Capa de Celular
    price: "29.90"
"#,
        );
        assert_eq!(file.products.len(), 2);
        assert!(validate(&file).is_empty());
        assert_eq!(file.products[1].category, None);
    }

    #[test]
    fn test_rejects_duplicates_and_negative_prices() {
        let file = parse(
            r#"
products:
  - name: Fone
    price: "10.00"
  - name: fone
    price: "-1.00"
  - name: "  "
    price: "1.00"
"#,
        );
        let errors = validate(&file);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().any(|e| e.contains("duplicate")));
        assert!(errors.iter().any(|e| e.contains("negative")));
        assert!(errors.iter().any(|e| e.contains("#3")));
    }
}
