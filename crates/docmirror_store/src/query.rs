//! Query options and paginated list results.

use crate::record::Record;

/// Server-side query configuration for list and single-record retrieval.
///
/// Filter and sort expressions are opaque strings passed through to the remote
/// store; docmirror never parses or evaluates them locally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Filter expression, evaluated server-side.
    pub filter: Option<String>,
    /// Sort expression, evaluated server-side.
    pub sort: Option<String>,
    /// Relation-expansion expression.
    pub expand: Option<String>,
    /// Field-selection expression.
    pub fields: Option<String>,
}

impl QueryOptions {
    /// Creates empty query options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the filter expression.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Sets the sort expression.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the relation-expansion expression.
    pub fn with_expand(mut self, expand: impl Into<String>) -> Self {
        self.expand = Some(expand.into());
        self
    }

    /// Sets the field-selection expression.
    pub fn with_fields(mut self, fields: impl Into<String>) -> Self {
        self.fields = Some(fields.into());
        self
    }
}

/// One page of a filtered/sorted list query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordPage {
    /// Records on this page, in server sort order.
    pub items: Vec<Record>,
    /// Page number (1-based).
    pub page: u32,
    /// Requested page size.
    pub per_page: u32,
    /// Total number of matching records across all pages.
    pub total_items: u64,
    /// Total number of pages.
    pub total_pages: u32,
}

impl RecordPage {
    /// Creates a page result, computing `total_pages` from the item count.
    pub fn new(items: Vec<Record>, page: u32, per_page: u32, total_items: u64) -> Self {
        let total_pages = if per_page == 0 {
            1
        } else {
            (total_items.div_ceil(u64::from(per_page)) as u32).max(1)
        };
        Self {
            items,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_options_builder() {
        let options = QueryOptions::new()
            .with_filter("status='open'")
            .with_sort("-created")
            .with_expand("author")
            .with_fields("id,title");

        assert_eq!(options.filter.as_deref(), Some("status='open'"));
        assert_eq!(options.sort.as_deref(), Some("-created"));
        assert_eq!(options.expand.as_deref(), Some("author"));
        assert_eq!(options.fields.as_deref(), Some("id,title"));
    }

    #[test]
    fn page_count_rounds_up() {
        let page = RecordPage::new(Vec::new(), 1, 50, 101);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn empty_result_still_has_one_page() {
        let page = RecordPage::new(Vec::new(), 1, 50, 0);
        assert_eq!(page.total_pages, 1);
        assert_eq!(page.total_items, 0);
    }
}
