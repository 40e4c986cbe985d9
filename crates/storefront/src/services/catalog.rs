//! Catalog filtering and stale-response protection.
//!
//! [`CatalogFilter`] turns the filter panel's state (brand plus free-text
//! search) into a [`RowQuery`] against the `motorcycles` table.
//!
//! [`QuerySequencer`] orders the results requests of one rendered catalog
//! page. Every full render opens a view; every results request for that view
//! takes a [`QueryTicket`] carrying the next sequence number. A ticket whose
//! query is still in flight when a newer ticket is issued is superseded: its
//! query future is dropped and the caller answers with no content, so a slow
//! response can never overwrite a newer one.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use azmotos_core::{BrandFilter, Motorcycle};
use moka::sync::Cache;
use tokio::sync::watch;
use uuid::Uuid;

use crate::supabase::{Filter, RowQuery, tables};

/// Columns searched by the free-text term.
pub const SEARCH_COLUMNS: [&str; 3] = ["model", "description", "brand"];

/// Views idle longer than this are forgotten.
///
/// Idle time is the only eviction rule: a view with a request in flight has
/// been touched within this window, so its channel is still the one newer
/// tickets are issued on.
const VIEW_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Brand and search-term restriction on the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogFilter {
    pub brand: BrandFilter,
    /// Trimmed search term; empty means no restriction.
    pub search: String,
}

impl CatalogFilter {
    #[must_use]
    pub fn new(brand: BrandFilter, search: &str) -> Self {
        Self {
            brand,
            search: search.trim().to_string(),
        }
    }

    /// The remote query selecting exactly the matching motorcycles. No
    /// ordering is requested.
    #[must_use]
    pub fn to_query(&self) -> RowQuery {
        let mut query = RowQuery::new(tables::MOTORCYCLES);

        if let Some(brand) = self.brand.brand() {
            query = query.filter(Filter::eq("brand", brand.as_str()));
        }

        if !self.search.is_empty() {
            query = query.filter(Filter::or(
                SEARCH_COLUMNS
                    .iter()
                    .map(|column| Filter::ilike(*column, self.search.as_str()))
                    .collect(),
            ));
        }

        query
    }

    /// Whether `bike` would be selected by [`to_query`](Self::to_query).
    #[must_use]
    pub fn matches(&self, bike: &Motorcycle) -> bool {
        serde_json::to_value(bike).is_ok_and(|row| self.to_query().matches(&row))
    }
}

/// Per-view request sequencing.
#[derive(Clone)]
pub struct QuerySequencer {
    views: Cache<Uuid, Arc<watch::Sender<u64>>>,
}

impl Default for QuerySequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl QuerySequencer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            views: Cache::builder()
                .time_to_idle(VIEW_IDLE_TIMEOUT)
                .build(),
        }
    }

    /// Start tracking a newly rendered catalog page.
    #[must_use]
    pub fn open_view(&self) -> Uuid {
        let view_id = Uuid::new_v4();
        self.views
            .insert(view_id, Arc::new(watch::channel(0).0));
        view_id
    }

    /// Issue the next ticket for `view_id`, superseding every earlier one.
    ///
    /// Unknown or expired views start a fresh sequence.
    #[must_use]
    pub fn begin(&self, view_id: Uuid) -> QueryTicket {
        let sender = self
            .views
            .get_with(view_id, || Arc::new(watch::channel(0).0));

        let mut sequence = 0;
        sender.send_modify(|latest| {
            *latest += 1;
            sequence = *latest;
        });

        QueryTicket {
            sequence,
            receiver: sender.subscribe(),
        }
    }

    /// The newest sequence number issued for `view_id`.
    #[must_use]
    pub fn latest(&self, view_id: Uuid) -> Option<u64> {
        self.views.get(&view_id).map(|sender| *sender.borrow())
    }
}

/// One results request's place in its view's sequence.
pub struct QueryTicket {
    sequence: u64,
    receiver: watch::Receiver<u64>,
}

impl QueryTicket {
    #[must_use]
    pub const fn sequence(&self) -> u64 {
        self.sequence
    }

    /// No newer ticket has been issued.
    #[must_use]
    pub fn is_current(&self) -> bool {
        *self.receiver.borrow() == self.sequence
    }

    /// Resolves once a newer ticket is issued for the same view.
    pub async fn superseded(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() != self.sequence {
                return;
            }
            if self.receiver.changed().await.is_err() {
                // The view idled out; nothing can supersede this ticket now.
                std::future::pending::<()>().await;
            }
        }
    }

    /// Drive `query` unless a newer ticket appears first.
    ///
    /// Returns `None` when superseded, either while in flight (the future is
    /// dropped) or by the time it completes.
    pub async fn run<F: Future>(mut self, query: F) -> Option<F::Output> {
        let output = tokio::select! {
            biased;
            () = self.superseded() => return None,
            output = query => output,
        };
        self.is_current().then_some(output)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use azmotos_core::{Brand, MotorcycleId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn bike(brand: &str, model: &str, description: Option<&str>) -> Motorcycle {
        Motorcycle {
            id: MotorcycleId::new(Uuid::new_v4()),
            brand: brand.to_string(),
            model: model.to_string(),
            year: 2024,
            price: Decimal::new(10_000_000, 0),
            description: description.map(String::from),
            specs: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    fn catalog() -> Vec<Motorcycle> {
        vec![bike("Honda", "CBR", None), bike("Ducati", "Panigale", None)]
    }

    fn select(filter: &CatalogFilter) -> Vec<String> {
        catalog()
            .into_iter()
            .filter(|b| filter.matches(b))
            .map(|b| b.title())
            .collect()
    }

    #[test]
    fn test_unfiltered_selects_everything() {
        let filter = CatalogFilter::default();
        assert_eq!(filter.to_query().query_pairs().len(), 1);
        assert_eq!(select(&filter), vec!["Honda CBR", "Ducati Panigale"]);
    }

    #[test]
    fn test_brand_filter_is_exact() {
        let filter = CatalogFilter::new(BrandFilter::Only(Brand::Honda), "");
        assert_eq!(select(&filter), vec!["Honda CBR"]);
        assert!(!filter.matches(&bike("honda", "CBR", None)));
    }

    #[test]
    fn test_search_any_case() {
        for term in ["pan", "PAN", "Pan", " pAn "] {
            let filter = CatalogFilter::new(BrandFilter::All, term);
            assert_eq!(select(&filter), vec!["Ducati Panigale"], "term {term:?}");
        }
    }

    #[test]
    fn test_search_covers_description_and_brand() {
        let filter = CatalogFilter::new(BrandFilter::All, "track");
        assert!(filter.matches(&bike("Racer", "R1", Some("Built for the TRACK"))));
        assert!(!filter.matches(&bike("Racer", "R1", None)));

        let filter = CatalogFilter::new(BrandFilter::All, "duc");
        assert!(filter.matches(&bike("Ducati", "Monster", None)));
    }

    #[test]
    fn test_brand_and_search_intersect() {
        let filter = CatalogFilter::new(BrandFilter::Only(Brand::Honda), "pan");
        assert!(select(&filter).is_empty());

        let filter = CatalogFilter::new(BrandFilter::Only(Brand::Ducati), "pan");
        assert_eq!(select(&filter), vec!["Ducati Panigale"]);
    }

    #[test]
    fn test_search_term_is_trimmed_before_matching() {
        // Surrounding whitespace typed into the search box is not part of
        // the term: " pAn " searches for "pAn".
        let filter = CatalogFilter::new(BrandFilter::All, " pAn ");
        assert_eq!(filter.search, "pAn");
        assert_eq!(filter, CatalogFilter::new(BrandFilter::All, "pAn"));
        assert!(filter.matches(&bike("Ducati", "Panigale", None)));
        assert!(!"Panigale".to_lowercase().contains(" pan "));
    }

    #[test]
    fn test_blank_search_is_no_restriction() {
        let filter = CatalogFilter::new(BrandFilter::All, "   ");
        assert_eq!(filter, CatalogFilter::default());
    }

    #[test]
    fn test_sequences_are_per_view() {
        let sequencer = QuerySequencer::new();
        let a = sequencer.open_view();
        let b = sequencer.open_view();

        assert_eq!(sequencer.begin(a).sequence(), 1);
        assert_eq!(sequencer.begin(a).sequence(), 2);
        assert_eq!(sequencer.begin(b).sequence(), 1);
        assert_eq!(sequencer.latest(a), Some(2));
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let sequencer = QuerySequencer::new();
        let view = sequencer.open_view();

        let older = sequencer.begin(view);
        assert!(older.is_current());
        let newer = sequencer.begin(view);
        assert!(!older.is_current());
        assert!(newer.is_current());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_is_cancelled_by_newer_request() {
        let sequencer = QuerySequencer::new();
        let view = sequencer.open_view();

        let slow = sequencer.begin(view).run(async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            "stale"
        });
        let fast = async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sequencer.begin(view).run(async { "fresh" }).await
        };

        let (slow, fast) = tokio::join!(slow, fast);
        assert_eq!(slow, None);
        assert_eq!(fast, Some("fresh"));
    }

    #[tokio::test]
    async fn test_completed_result_is_discarded_when_superseded() {
        let sequencer = QuerySequencer::new();
        let view = sequencer.open_view();

        let older = sequencer.begin(view);
        let _newer = sequencer.begin(view);
        assert_eq!(older.run(async { 1 }).await, None);
    }

    #[test]
    fn test_busy_view_survives_many_other_views() {
        let sequencer = QuerySequencer::new();
        let view = sequencer.open_view();
        let in_flight = sequencer.begin(view);

        for _ in 0..12_000 {
            let _ = sequencer.open_view();
        }
        sequencer.views.run_pending_tasks();

        let newer = sequencer.begin(view);
        assert_eq!(newer.sequence(), 2);
        assert!(!in_flight.is_current());
    }

    #[tokio::test]
    async fn test_unknown_view_starts_fresh() {
        let sequencer = QuerySequencer::new();
        let ticket = sequencer.begin(Uuid::new_v4());
        assert_eq!(ticket.sequence(), 1);
        assert_eq!(ticket.run(async { 7 }).await, Some(7));
    }
}
