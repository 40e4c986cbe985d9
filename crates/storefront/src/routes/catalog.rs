//! Catalog route handlers.
//!
//! The full page renders the filter panel and the first result set. Each
//! brand click or keystroke then asks `/catalog/results` for just the results
//! fragment. Requests carry the page's `view` id so an answer that arrives
//! after a newer request has been issued is dropped (`204`, HTMX keeps what it
//! has).

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use azmotos_core::{Brand, BrandFilter, Motorcycle};
use serde::Deserialize;
use uuid::Uuid;

use crate::config::CatalogFailureMode;
use crate::filters;
use crate::middleware::RequireSession;
use crate::services::CatalogFilter;
use crate::state::AppState;

/// Image shown for motorcycles without one.
pub const DEFAULT_IMAGE: &str = "/static/img/default-motorcycle.svg";

/// Shown in the banner when the catalog query fails.
const CATALOG_ERROR_MESSAGE: &str = "The catalog could not be loaded. Please try again.";

/// Filter panel state, carried in the query string.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub brand: Option<String>,
    pub q: Option<String>,
    /// `open` shows the filter panel
    pub filters: Option<String>,
    /// Catalog page that issued a results request
    pub view: Option<Uuid>,
}

impl CatalogQuery {
    /// Unknown brands fall back to all brands.
    fn filter(&self) -> CatalogFilter {
        let brand = self
            .brand
            .as_deref()
            .map_or(Ok(BrandFilter::All), str::parse::<BrandFilter>)
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Ignoring unknown brand filter");
                BrandFilter::All
            });
        CatalogFilter::new(brand, self.q.as_deref().unwrap_or_default())
    }

    fn filters_open(&self) -> bool {
        self.filters.as_deref() == Some("open")
    }
}

/// One entry of the brand selector.
pub struct BrandOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

fn brand_options(selected: BrandFilter) -> Vec<BrandOption> {
    std::iter::once(BrandOption {
        value: BrandFilter::ALL_VALUE,
        label: "All brands",
        selected: selected == BrandFilter::All,
    })
    .chain(Brand::ALL.into_iter().map(|brand| BrandOption {
        value: brand.as_str(),
        label: brand.as_str(),
        selected: selected == BrandFilter::Only(brand),
    }))
    .collect()
}

/// A motorcycle as shown on a catalog card.
pub struct CardView {
    pub href: String,
    pub title: String,
    pub year: i32,
    pub price: String,
    pub image_url: String,
    pub description: Option<String>,
}

impl From<&Motorcycle> for CardView {
    fn from(bike: &Motorcycle) -> Self {
        Self {
            href: format!("/motorcycle/{}", bike.id),
            title: bike.title(),
            year: bike.year,
            price: bike.price().display(),
            image_url: bike
                .image_url
                .as_deref()
                .map(str::trim)
                .filter(|url| !url.is_empty())
                .unwrap_or(DEFAULT_IMAGE)
                .to_string(),
            description: bike.description().map(String::from),
        }
    }
}

fn cards(bikes: &[Motorcycle]) -> Vec<CardView> {
    bikes.iter().map(CardView::from).collect()
}

/// Catalog page template.
#[derive(Template, WebTemplate)]
#[template(path = "catalog/index.html")]
pub struct CatalogTemplate {
    pub brands: Vec<BrandOption>,
    pub search: String,
    pub filters_open: bool,
    pub toggle_href: String,
    pub view_id: Uuid,
    pub cards: Vec<CardView>,
    pub error: Option<String>,
}

/// Results fragment template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "catalog/results_fragment.html")]
pub struct ResultsTemplate {
    pub cards: Vec<CardView>,
}

/// Error banner fragment template (HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "catalog/error_banner.html")]
pub struct ErrorBannerTemplate {
    pub message: String,
}

/// Link that flips panel visibility, keeping the filters.
fn toggle_href(filter: &CatalogFilter, open: bool) -> String {
    let mut href = format!("/catalog?brand={}", filter.brand.as_str());
    if !filter.search.is_empty() {
        href.push_str("&q=");
        href.push_str(&urlencoding::encode(&filter.search));
    }
    if !open {
        href.push_str("&filters=open");
    }
    href
}

/// Display the catalog page.
#[tracing::instrument(skip_all, fields(user_id = %current.user_id))]
pub async fn index(
    State(state): State<AppState>,
    RequireSession(current): RequireSession,
    Query(query): Query<CatalogQuery>,
) -> Response {
    let filter = query.filter();
    let filters_open = query.filters_open();
    let view_id = state.sequencer().open_view();

    let (cards, error) = match state
        .gateway()
        .fetch_motorcycles(&filter.to_query(), Some(&current.access_token))
        .await
    {
        Ok(bikes) => (cards(&bikes), None),
        Err(e) => {
            tracing::error!(error = %e, "Catalog query failed");
            let error = match state.config().catalog_failure_mode {
                CatalogFailureMode::Silent => None,
                CatalogFailureMode::Banner => Some(CATALOG_ERROR_MESSAGE.to_string()),
            };
            (Vec::new(), error)
        }
    };

    CatalogTemplate {
        brands: brand_options(filter.brand),
        toggle_href: toggle_href(&filter, filters_open),
        search: filter.search,
        filters_open,
        view_id,
        cards,
        error,
    }
    .into_response()
}

/// Re-run the catalog query and return only the results fragment.
#[tracing::instrument(skip_all, fields(user_id = %current.user_id))]
pub async fn results(
    State(state): State<AppState>,
    RequireSession(current): RequireSession,
    Query(query): Query<CatalogQuery>,
) -> Response {
    let filter = query.filter();
    let view_id = query.view.unwrap_or_else(|| state.sequencer().open_view());
    let ticket = state.sequencer().begin(view_id);
    let sequence = ticket.sequence();

    let remote = filter.to_query();
    let fetched = ticket
        .run(
            state
                .gateway()
                .fetch_motorcycles(&remote, Some(&current.access_token)),
        )
        .await;

    match fetched {
        None => {
            tracing::debug!(%view_id, sequence, "Dropped superseded catalog request");
            StatusCode::NO_CONTENT.into_response()
        }
        Some(Ok(bikes)) => ResultsTemplate {
            cards: cards(&bikes),
        }
        .into_response(),
        Some(Err(e)) => {
            tracing::error!(error = %e, %view_id, sequence, "Catalog query failed");
            match state.config().catalog_failure_mode {
                CatalogFailureMode::Silent => StatusCode::NO_CONTENT.into_response(),
                CatalogFailureMode::Banner => (
                    [("hx-retarget", "#catalog-error"), ("hx-reswap", "innerHTML")],
                    ErrorBannerTemplate {
                        message: CATALOG_ERROR_MESSAGE.to_string(),
                    },
                )
                    .into_response(),
            }
        }
    }
}
