//! Seed the catalog from a YAML file.
//!
//! # File format
//!
//! ```yaml
//! products:
//!   - name: Camiseta Básica
//!     description: Algodão orgânico
//!     price: "49.90"
//!     brand: Vitrine
//!     category: camisetas
//!     in_stock: 25
//!     images:
//!       - color: Preto
//!         color_code: "#000000"
//!         image: https://img.example.com/basica-preto.png
//! ```

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use vitrine_storefront::db::ProductRepository;
use vitrine_storefront::models::NewProduct;

use super::{CommandError, connect};

#[derive(Debug, Deserialize)]
struct CatalogFile {
    products: Vec<NewProduct>,
}

/// Parse and validate a catalog file's contents.
fn parse_catalog(content: &str) -> Result<Vec<NewProduct>, CommandError> {
    let catalog: CatalogFile = serde_yaml::from_str(content)?;

    for product in &catalog.products {
        product
            .validate()
            .map_err(|reason| CommandError::InvalidProduct {
                name: product.name.clone(),
                reason,
            })?;
    }

    Ok(catalog.products)
}

/// Insert every product of the catalog file.
///
/// The whole file is validated before the database is touched.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML catalog
/// * `clear_existing` - If true, delete the current catalog first
///
/// # Errors
///
/// Returns an error if the file can't be read or validated, or a database
/// operation fails.
pub async fn products(file_path: &str, clear_existing: bool) -> Result<(), CommandError> {
    let path = Path::new(file_path);
    info!(path = %file_path, "Loading catalog from file");

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CommandError::Io {
            path: file_path.to_owned(),
            source,
        })?;
    let products = parse_catalog(&content)?;
    info!(products = products.len(), "Catalog validated");

    let pool = connect().await?;
    let repo = ProductRepository::new(&pool);

    if clear_existing {
        let removed = repo.delete_all().await?;
        info!(removed, "Cleared existing catalog");
    }

    for product in &products {
        let created = repo.create(product).await?;
        info!(product_id = %created.id, name = %created.name, "Product created");
    }

    info!("Seeding complete! Products inserted: {}", products.len());
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    const CATALOG: &str = r##"
products:
  - name: Camiseta Básica
    description: Algodão orgânico
    price: "49.90"
    brand: Vitrine
    category: camisetas
    in_stock: 25
    images:
      - color: Preto
        color_code: "#000000"
        image: https://img.example.com/basica-preto.png
  - name: Boné
    price: "35.00"
    category: acessorios
    in_stock: 0
    images:
      - color: Azul
        color_code: "#0000ff"
        image: https://img.example.com/bone-azul.png
"##;

    #[test]
    fn test_parse_catalog() {
        let products = parse_catalog(CATALOG).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].price, Decimal::new(4990, 2));
        assert_eq!(products[0].images[0].color, "Preto");
        // Optional fields default to empty.
        assert_eq!(products[1].brand, "");
        assert_eq!(products[1].description, "");
    }

    #[test]
    fn test_parse_catalog_rejects_product_without_images() {
        let content = r#"
products:
  - name: Sem Foto
    price: "10.00"
    category: camisetas
    in_stock: 1
    images: []
"#;
        let err = parse_catalog(content).unwrap_err();
        assert!(matches!(err, CommandError::InvalidProduct { ref name, .. } if name == "Sem Foto"));
    }

    #[test]
    fn test_parse_catalog_rejects_bad_yaml() {
        assert!(matches!(
            parse_catalog("products: 3"),
            Err(CommandError::Yaml(_))
        ));
    }
}
