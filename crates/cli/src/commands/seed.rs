//! Seed the catalog from a YAML file.
//!
//! The file is a list of motorcycles:
//!
//! ```yaml
//! - brand: BMW
//!   model: R 1250 GS
//!   year: 2022
//!   price: 12500000
//!   description: Adventure tourer
//!   specs:
//!     engine: 1254 cc boxer twin
//!     power: 136 hp
//!   image_url: https://example.supabase.co/storage/v1/object/public/bikes/gs.jpg
//! ```
//!
//! Every entry is validated before anything is inserted. Entries are then
//! inserted one at a time; a rejected insert is reported and the rest still
//! go through.

use std::path::Path;

use chrono::Datelike;
use rust_decimal::Decimal;
use tracing::{error, info};

use azmotos_core::NewMotorcycle;
use azmotos_storefront::supabase::{Gateway, tables};

use super::service_client;

/// Earliest model year accepted.
const MIN_YEAR: i32 = 1900;

/// Why an entry was rejected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("entry {index}: {message}")]
    Malformed { index: usize, message: String },

    #[error("entry {index} ({model}): model is empty")]
    EmptyModel { index: usize, model: String },

    #[error("entry {index} ({model}): year {year} is out of range (accepted up to {max})")]
    Year {
        index: usize,
        model: String,
        year: i32,
        max: i32,
    },

    #[error("entry {index} ({model}): price must be positive")]
    Price { index: usize, model: String },
}

/// Parse and validate every entry; `current_year` bounds the model year.
///
/// # Errors
///
/// Returns every problem found, or the YAML error if the file is not a list.
pub fn parse_entries(
    content: &str,
    current_year: i32,
) -> Result<Result<Vec<NewMotorcycle>, Vec<EntryError>>, serde_yaml::Error> {
    let raw: Vec<serde_yaml::Value> = serde_yaml::from_str(content)?;

    let mut entries = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (index, value) in raw.into_iter().enumerate() {
        let index = index + 1;
        match serde_yaml::from_value::<NewMotorcycle>(value) {
            Ok(bike) => match validate(index, &bike, current_year) {
                Ok(()) => entries.push(bike),
                Err(e) => errors.push(e),
            },
            Err(e) => errors.push(EntryError::Malformed {
                index,
                message: e.to_string(),
            }),
        }
    }

    Ok(if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    })
}

fn validate(index: usize, bike: &NewMotorcycle, current_year: i32) -> Result<(), EntryError> {
    let model = bike.model.trim().to_string();
    if model.is_empty() {
        return Err(EntryError::EmptyModel { index, model });
    }

    let max = current_year + 1;
    if !(MIN_YEAR..=max).contains(&bike.year) {
        return Err(EntryError::Year {
            index,
            model,
            year: bike.year,
            max,
        });
    }

    if bike.price <= Decimal::ZERO {
        return Err(EntryError::Price { index, model });
    }

    Ok(())
}

/// Insert the motorcycles listed in `file_path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, fails validation, or the
/// backend settings are missing.
pub async fn catalog(file_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading motorcycles from file");
    let content = tokio::fs::read_to_string(path).await?;

    let entries = match parse_entries(&content, chrono::Utc::now().year())? {
        Ok(entries) => entries,
        Err(errors) => {
            error!("Validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };
    info!(count = entries.len(), "Entries validated");

    let client = service_client()?;
    let gateway: &dyn Gateway = &client;

    let mut inserted = 0_usize;
    let mut failed = Vec::new();
    for bike in &entries {
        let row = serde_json::to_value(bike)?;
        match gateway.insert_row(tables::MOTORCYCLES, &row, None).await {
            Ok(()) => inserted += 1,
            Err(e) => failed.push((format!("{} {}", bike.brand, bike.model), e)),
        }
    }

    info!("Seeding complete!");
    info!("  Inserted: {inserted}");
    if !failed.is_empty() {
        error!("  Failed: {}", failed.len());
        for (bike, err) in &failed {
            error!("    - {bike}: {err}");
        }
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use azmotos_core::Brand;

    const YAML: &str = r"
- brand: BMW
  model: R 1250 GS
  year: 2022
  price: 12500000
  specs:
    engine: 1254 cc
- brand: Ducati
  model: Monster
  year: 2024
  price: '6900000.00'
";

    #[test]
    fn test_parses_valid_file() {
        let entries = parse_entries(YAML, 2025).unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].brand, Brand::Bmw);
        assert_eq!(
            entries[0].specs.as_ref().unwrap().engine.as_deref(),
            Some("1254 cc")
        );
        assert_eq!(entries[1].description, None);
    }

    #[test]
    fn test_collects_every_invalid_entry() {
        let yaml = r"
- brand: Vespa
  model: Primavera
  year: 2020
  price: 1000
- brand: KTM
  model: 890 Adventure
  year: 2031
  price: 9000000
- brand: Honda
  model: ' '
  year: 2020
  price: 1
- brand: Suzuki
  model: MT-07
  year: 2023
  price: 0
";
        let errors = parse_entries(yaml, 2025).unwrap().unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(matches!(errors[0], EntryError::Malformed { index: 1, .. }));
        assert_eq!(
            errors[1],
            EntryError::Year {
                index: 2,
                model: "890 Adventure".to_string(),
                year: 2031,
                max: 2026,
            }
        );
        assert!(matches!(errors[2], EntryError::EmptyModel { index: 3, .. }));
        assert_eq!(
            errors[3],
            EntryError::Price {
                index: 4,
                model: "MT-07".to_string(),
            }
        );
    }

    #[test]
    fn test_not_a_list_is_a_yaml_error() {
        assert!(parse_entries("brand: BMW", 2025).is_err());
    }
}
