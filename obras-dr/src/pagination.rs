//! Page window over the dashboard view for the operations listing

use serde::Serialize;

/// Rows per listing page
pub const PAGE_SIZE: i64 = 100;

/// The slice of the view one listing response covers.
///
/// Serialized straight into the response envelope; the SQL offset stays
/// internal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub total_rows: i64,
    /// 1-indexed, always addressable even when the view is empty
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    #[serde(skip)]
    offset: i64,
}

impl PageWindow {
    /// Place `requested_page` inside the view, clamping to `[1, total_pages]`
    ///
    /// # Examples
    /// ```
    /// use obras_dr::pagination::PageWindow;
    ///
    /// let window = PageWindow::locate(250, 99);
    /// assert_eq!(window.page, 3);
    /// assert_eq!(window.offset(), 200);
    /// ```
    pub fn locate(total_rows: i64, requested_page: i64) -> Self {
        let total_rows = total_rows.max(0);
        let total_pages = (total_rows + PAGE_SIZE - 1) / PAGE_SIZE;
        let page = requested_page.clamp(1, total_pages.max(1));

        Self {
            total_rows,
            page,
            page_size: PAGE_SIZE,
            total_pages,
            offset: (page - 1) * PAGE_SIZE,
        }
    }

    /// Rows to skip in the view's stable order
    pub fn offset(&self) -> i64 {
        self.offset
    }

    /// Whether the request was moved to the nearest valid page
    pub fn was_clamped(&self, requested_page: i64) -> bool {
        self.page != requested_page
    }
}
