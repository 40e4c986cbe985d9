//! Catalog browsing.
//!
//! Runs the same query the storefront's catalog page runs, so an operator can
//! check what a visitor sees for a given brand and search term.

use uuid::Uuid;

use azmotos_core::{BrandFilter, Motorcycle, MotorcycleId};
use azmotos_storefront::services::CatalogFilter;
use azmotos_storefront::supabase::Gateway;

use super::service_client;

/// One output line: `id  brand model year price`.
fn summary_line(bike: &Motorcycle) -> String {
    format!(
        "{}  {} {} {}  {}",
        bike.id,
        bike.brand,
        bike.model,
        bike.year,
        bike.price().display()
    )
}

/// List motorcycles matching `brand` and `search`.
///
/// # Errors
///
/// Returns an error if the brand is unknown or the query fails.
pub async fn list(brand: &str, search: &str) -> Result<(), Box<dyn std::error::Error>> {
    let brand: BrandFilter = brand.parse()?;
    let filter = CatalogFilter::new(brand, search);

    let client = service_client()?;
    let gateway: &dyn Gateway = &client;
    let bikes = gateway.fetch_motorcycles(&filter.to_query(), None).await?;

    if bikes.is_empty() {
        tracing::info!("No motorcycles match");
        return Ok(());
    }

    for bike in &bikes {
        tracing::info!("{}", summary_line(bike));
    }
    tracing::info!("{} motorcycle(s)", bikes.len());

    Ok(())
}

/// Show one motorcycle.
///
/// # Errors
///
/// Returns an error if the id is not a UUID or the lookup fails.
pub async fn show(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let id = MotorcycleId::new(Uuid::parse_str(id.trim())?);

    let client = service_client()?;
    let gateway: &dyn Gateway = &client;

    let Some(bike) = gateway.fetch_motorcycle(id, None).await? else {
        tracing::info!("Motorcycle {id} not found");
        return Ok(());
    };

    tracing::info!("{}", bike.title());
    tracing::info!("  Id: {}", bike.id);
    tracing::info!("  Year: {}", bike.year);
    tracing::info!("  Price: {}", bike.price().display());
    tracing::info!("  Description: {}", bike.description().unwrap_or("-"));
    if let Some(specs) = &bike.specs {
        let rows = [
            ("Engine", &specs.engine),
            ("Power", &specs.power),
            ("Weight", &specs.weight),
            ("Top speed", &specs.top_speed),
        ];
        for (label, value) in rows {
            tracing::info!("  {label}: {}", value.as_deref().unwrap_or("-"));
        }
    }
    if let Some(image) = &bike.image_url {
        tracing::info!("  Image: {image}");
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_line() {
        let bike: Motorcycle = serde_json::from_value(json!({
            "id": "6f1c7a52-2b0e-4d8c-9a43-1e2f3a4b5c6d",
            "brand": "BMW",
            "model": "R 1250 GS",
            "year": 2022,
            "price": 12_500_000,
            "description": null,
            "specs": null,
            "image_url": null,
            "created_at": "2024-03-01T10:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(
            summary_line(&bike),
            "6f1c7a52-2b0e-4d8c-9a43-1e2f3a4b5c6d  BMW R 1250 GS 2022  12 500 000 ₸"
        );
    }
}
