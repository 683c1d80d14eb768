//! Paginated collection shapes.
//!
//! Collection endpoints return a `page` object alongside `_embedded`
//! items; `PaginatedList` is the decoded form handed to callers.

use serde::{Deserialize, Serialize};

/// The HAL `page` object of a collection response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Requested page size.
    #[serde(default)]
    pub size: u32,
    /// Total number of elements across all pages.
    #[serde(default)]
    pub total_elements: u64,
    /// Total number of pages.
    #[serde(default)]
    pub total_pages: u32,
    /// Zero-based index of the current page.
    #[serde(default, rename = "number")]
    pub current_page: u32,
}

/// One page of decoded resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginatedList<T> {
    /// Pagination metadata for this page.
    pub page_info: PageInfo,
    /// The decoded elements of this page, in response order.
    pub items: Vec<T>,
}

impl<T> PaginatedList<T> {
    /// Build a page from its parts.
    #[must_use]
    pub fn new(page_info: PageInfo, items: Vec<T>) -> Self {
        Self { page_info, items }
    }

    /// A single-page list containing all of `items`.
    #[must_use]
    pub fn from_items(items: Vec<T>) -> Self {
        let len = items.len();
        Self {
            page_info: PageInfo {
                size: u32::try_from(len).unwrap_or(u32::MAX),
                total_elements: len as u64,
                total_pages: 1,
                current_page: 0,
            },
            items,
        }
    }

    /// Number of elements on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether this page is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
