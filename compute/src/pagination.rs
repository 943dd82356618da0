//! Offset/limit page accumulation driven by the `Total-Count` header.

use reqwest::header::HeaderMap;
use serde_json::Value;

/// Response header announcing the total number of items across all pages.
pub const TOTAL_COUNT_HEADER: &str = "Total-Count";

/// Items requested per page.
pub const PAGE_LIMIT: u64 = 50;

/// How the `Total-Count` header of a response reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalCount {
    /// No header: a single-object response.
    Absent,
    /// A paginated response with this many items in total.
    Total(u64),
    /// The header is present but not an unsigned integer.
    Invalid,
}

/// Read the `Total-Count` header.
#[must_use]
pub fn total_count(headers: &HeaderMap) -> TotalCount {
    match headers.get(TOTAL_COUNT_HEADER) {
        None => TotalCount::Absent,
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .map_or(TotalCount::Invalid, TotalCount::Total),
    }
}

/// Transient state of one paginated call.
#[derive(Debug, Clone)]
pub struct PageAccumulator {
    offset: u64,
    limit: u64,
    more: bool,
    items: Vec<Value>,
}

impl Default for PageAccumulator {
    fn default() -> Self {
        Self::new(PAGE_LIMIT)
    }
}

impl PageAccumulator {
    /// Start at offset zero with the given page size.
    #[must_use]
    pub fn new(limit: u64) -> Self {
        Self {
            offset: 0,
            limit: limit.max(1),
            more: false,
            items: Vec::new(),
        }
    }

    /// Query pairs selecting the next page.
    #[must_use]
    pub fn window(&self) -> [(&'static str, String); 2] {
        [("limit", self.limit.to_string()), ("offset", self.offset.to_string())]
    }

    /// Record one page. Items are kept only when `total > 0`; a JSON array
    /// is flattened, `null` adds nothing and any other value is one item.
    pub fn record(&mut self, total: u64, page: Value) {
        if total > 0 {
            match page {
                Value::Array(items) => self.items.extend(items),
                Value::Null => {}
                other => self.items.push(other),
            }
        }
        self.offset += self.limit;
        self.more = self.offset < total;
    }

    /// Whether another page should be fetched.
    #[must_use]
    pub const fn has_more(&self) -> bool {
        self.more
    }

    /// Offset of the next page.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Items collected so far.
    #[must_use]
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    /// Consume the accumulator, yielding collected items in page order.
    #[must_use]
    pub fn into_items(self) -> Vec<Value> {
        self.items
    }
}
