//! Page planning for "fetch everything updated since" queries.
//!
//! The remote lists records most-recently-updated first, 100 per page. A
//! fetch walks pages from 1 and stops at the first empty page. It never stops
//! early on an old `updated_at`, because the remote's ordering is not trusted.

use chrono::{DateTime, SecondsFormat, Utc};

/// Records requested per page.
pub const PAGE_SIZE: u32 = 100;

/// Pages walked before a fetch is considered runaway.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Query parameters for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    /// Records per page.
    pub per_page: u32,
    /// Only records updated at or after this instant.
    pub since: Option<DateTime<Utc>>,
}

impl PageRequest {
    /// Render as `(name, value)` query pairs.
    ///
    /// `since` is only included when a cursor exists.
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("state".to_string(), "all".to_string()),
            ("per_page".to_string(), self.per_page.to_string()),
            ("page".to_string(), self.page.to_string()),
            ("sort".to_string(), "updated".to_string()),
            ("direction".to_string(), "desc".to_string()),
        ];
        if let Some(since) = self.since {
            params.push((
                "since".to_string(),
                since.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        params
    }
}

/// What to do after a page came back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStep {
    /// Request this page next.
    Next(PageRequest),
    /// The last page was empty; the fetch is complete.
    Done,
    /// The page limit was reached while pages were still non-empty.
    LimitReached {
        /// Pages fetched before giving up.
        pages: u32,
    },
}

/// Walks page numbers for one fetch.
#[derive(Debug, Clone)]
pub struct PagePlan {
    since: Option<DateTime<Utc>>,
    page: u32,
    max_pages: u32,
}

impl PagePlan {
    /// Plan a fetch of everything updated since `since` (or everything).
    pub fn new(since: Option<DateTime<Utc>>) -> Self {
        Self::with_max_pages(since, DEFAULT_MAX_PAGES)
    }

    /// Plan a fetch with a custom runaway limit (at least one page).
    pub fn with_max_pages(since: Option<DateTime<Utc>>, max_pages: u32) -> Self {
        Self {
            since,
            page: 1,
            max_pages: max_pages.max(1),
        }
    }

    /// The request for the current page.
    pub fn request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            per_page: PAGE_SIZE,
            since: self.since,
        }
    }

    /// Record how many records the current page held and move on.
    pub fn advance(&mut self, records_in_page: usize) -> PageStep {
        if records_in_page == 0 {
            return PageStep::Done;
        }
        if self.page >= self.max_pages {
            return PageStep::LimitReached { pages: self.page };
        }
        self.page += 1;
        PageStep::Next(self.request())
    }
}
