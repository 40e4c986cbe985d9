//! Motorcycle detail route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use azmotos_core::{Motorcycle, MotorcycleId, Specs};
use tracing::instrument;
use uuid::Uuid;

use crate::config::DealerConfig;
use crate::filters;
use crate::middleware::RequireSession;
use crate::routes::catalog::DEFAULT_IMAGE;
use crate::state::AppState;

/// Shown for a spec the record does not have.
pub const UNSPECIFIED: &str = "unspecified";

/// Shown when the record has no description.
pub const NO_DESCRIPTION: &str = "No description.";

/// One labelled line of the spec table.
pub struct SpecRow {
    pub label: &'static str,
    pub value: String,
}

fn spec_rows(specs: Option<&Specs>) -> Vec<SpecRow> {
    let specs = specs.cloned().unwrap_or_default();
    [
        ("Engine", specs.engine),
        ("Power", specs.power),
        ("Weight", specs.weight),
        ("Top speed", specs.top_speed),
    ]
    .into_iter()
    .map(|(label, value)| SpecRow {
        label,
        value: value.unwrap_or_else(|| UNSPECIFIED.to_string()),
    })
    .collect()
}

/// `https://wa.me/` link with a message naming the motorcycle.
fn whatsapp_link(dealer: &DealerConfig, bike: &Motorcycle, price: &str) -> Option<String> {
    let number = dealer.whatsapp.as_deref()?;
    let text = format!(
        "Hello! I am interested in the {} {} listed at {price}.",
        bike.brand, bike.model
    );
    Some(format!(
        "https://wa.me/{number}?text={}",
        urlencoding::encode(&text)
    ))
}

/// Motorcycle detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "motorcycle/show.html")]
pub struct DetailTemplate {
    pub brand: String,
    pub model: String,
    pub year: i32,
    pub price: String,
    pub description: String,
    pub image_url: String,
    pub specs: Vec<SpecRow>,
    pub whatsapp_url: Option<String>,
}

impl DetailTemplate {
    fn new(bike: &Motorcycle, dealer: &DealerConfig) -> Self {
        let price = bike.price().display();
        Self {
            whatsapp_url: whatsapp_link(dealer, bike, &price),
            brand: bike.brand.clone(),
            model: bike.model.clone(),
            year: bike.year,
            price,
            description: bike.description().unwrap_or(NO_DESCRIPTION).to_string(),
            image_url: bike
                .image_url
                .as_deref()
                .filter(|url| !url.trim().is_empty())
                .unwrap_or(DEFAULT_IMAGE)
                .to_string(),
            specs: spec_rows(bike.specs.as_ref()),
        }
    }
}

/// Not-found / error page for the detail view.
#[derive(Template, WebTemplate)]
#[template(path = "motorcycle/not_found.html")]
pub struct NotFoundTemplate {
    /// The backend's message when the lookup failed
    pub message: Option<String>,
}

fn not_found(message: Option<String>) -> Response {
    (StatusCode::NOT_FOUND, NotFoundTemplate { message }).into_response()
}

/// Display one motorcycle.
///
/// An id that is not a UUID cannot name a row, so it is answered like an
/// unknown one without asking the backend.
#[instrument(skip(state, current), fields(user_id = %current.user_id))]
pub async fn show(
    State(state): State<AppState>,
    RequireSession(current): RequireSession,
    Path(id): Path<String>,
) -> Response {
    let Ok(uuid) = Uuid::parse_str(id.trim()) else {
        tracing::debug!("Motorcycle id is not a UUID");
        return not_found(None);
    };

    match state
        .gateway()
        .fetch_motorcycle(MotorcycleId::new(uuid), Some(&current.access_token))
        .await
    {
        Ok(Some(bike)) => DetailTemplate::new(&bike, &state.config().dealer).into_response(),
        Ok(None) => not_found(None),
        Err(e) => {
            tracing::error!(error = %e, "Motorcycle lookup failed");
            not_found(Some(e.to_string()))
        }
    }
}

/// `/motorcycle` without an id.
pub async fn missing(RequireSession(_): RequireSession) -> Response {
    not_found(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn bike(specs: Option<Specs>) -> Motorcycle {
        Motorcycle {
            id: MotorcycleId::new(Uuid::nil()),
            brand: "Kawasaki".to_string(),
            model: "Ninja ZX-10R".to_string(),
            year: 2024,
            price: Decimal::new(12_500_000, 0),
            description: Some("  ".to_string()),
            specs,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_missing_specs_render_unspecified() {
        let page = DetailTemplate::new(&bike(None), &DealerConfig::default());
        assert!(page.specs.iter().all(|row| row.value == UNSPECIFIED));

        let partial = Specs {
            engine: Some("998 cc".to_string()),
            ..Specs::default()
        };
        let page = DetailTemplate::new(&bike(Some(partial)), &DealerConfig::default());
        let values: Vec<_> = page.specs.iter().map(|row| row.value.as_str()).collect();
        assert_eq!(values, vec!["998 cc", UNSPECIFIED, UNSPECIFIED, UNSPECIFIED]);
    }

    #[test]
    fn test_blank_description_and_image_fall_back() {
        let page = DetailTemplate::new(&bike(None), &DealerConfig::default());
        assert_eq!(page.description, NO_DESCRIPTION);
        assert_eq!(page.image_url, DEFAULT_IMAGE);
        assert_eq!(page.price, "12 500 000 ₸");
    }

    #[test]
    fn test_whatsapp_link_names_bike_and_price() {
        assert!(
            DetailTemplate::new(&bike(None), &DealerConfig::default())
                .whatsapp_url
                .is_none()
        );

        let dealer = DealerConfig {
            whatsapp: Some("77001234567".to_string()),
            ..DealerConfig::default()
        };
        let url = DetailTemplate::new(&bike(None), &dealer)
            .whatsapp_url
            .unwrap_or_default();
        assert!(url.starts_with("https://wa.me/77001234567?text="));
        assert!(url.contains("Kawasaki%20Ninja%20ZX-10R"));
        assert!(url.contains("12%20500%20000%20%E2%82%B8"));
    }
}
