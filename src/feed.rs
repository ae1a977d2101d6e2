//! Browse feed pipeline.
//!
//! Pure, client-side view over the fetched listing collection: type filter,
//! case-insensitive name search, timestamp sort, fixed-size pagination.
//! Claimed listings never enter the pipeline; they are dropped at ingest.

use serde::{Deserialize, Serialize};

use crate::model::{Listing, ListingKind, LoadState};
use crate::PAGE_SIZE;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Lost,
    Found,
}

impl TypeFilter {
    #[must_use]
    pub const fn matches(self, kind: ListingKind) -> bool {
        match self {
            Self::All => true,
            Self::Lost => matches!(kind, ListingKind::Lost),
            Self::Found => matches!(kind, ListingKind::Found),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SortOrder {
    Ascending,
    #[default]
    Descending,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedQuery {
    pub search: String,
    pub filter: TypeFilter,
    pub sort: SortOrder,
    pub page: usize,
}

#[derive(Clone, Debug, Default)]
pub struct FeedState {
    listings: Vec<Listing>,
    pub load: LoadState,
    pub query: FeedQuery,
}

/// One page of the pipeline's output.
#[derive(Clone, Debug, PartialEq)]
pub struct FeedPage {
    pub items: Vec<Listing>,
    pub has_more: bool,
}

impl FeedState {
    /// Replaces the input set with a fresh fetch. Claimed listings are
    /// excluded here so no later stage ever sees them.
    pub fn ingest(&mut self, listings: Vec<Listing>) {
        self.listings = listings.into_iter().filter(|l| !l.claimed).collect();
        self.load = LoadState::Loaded;
    }

    pub fn set_search(&mut self, search: String) {
        self.query.search = search;
        self.query.page = 0;
    }

    pub fn set_filter(&mut self, filter: TypeFilter) {
        self.query.filter = filter;
        self.query.page = 0;
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        self.query.sort = sort;
        self.query.page = 0;
    }

    pub fn next_page(&mut self) {
        if self.page().has_more {
            self.query.page += 1;
        }
    }

    pub fn previous_page(&mut self) {
        self.query.page = self.query.page.saturating_sub(1);
    }

    /// Runs the pipeline for the current query: filter, search, sort, slice.
    #[must_use]
    pub fn page(&self) -> FeedPage {
        let needle = self.query.search.trim().to_lowercase();

        let mut filtered: Vec<&Listing> = self
            .listings
            .iter()
            .filter(|l| self.query.filter.matches(l.kind))
            .filter(|l| {
                if needle.is_empty() {
                    return true;
                }
                // Search is on the name only; unnamed listings never match.
                l.name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&needle))
            })
            .collect();

        // Stable sort; the relative order of equal timestamps is not part of
        // the contract.
        match self.query.sort {
            SortOrder::Ascending => filtered.sort_by_key(|l| l.date),
            SortOrder::Descending => filtered.sort_by_key(|l| std::cmp::Reverse(l.date)),
        }

        let start = self.query.page * PAGE_SIZE;
        let end = (start + PAGE_SIZE).min(filtered.len());
        let items = if start < filtered.len() {
            filtered[start..end].iter().map(|l| (*l).clone()).collect()
        } else {
            Vec::new()
        };

        FeedPage {
            items,
            has_more: end < filtered.len(),
        }
    }
}
