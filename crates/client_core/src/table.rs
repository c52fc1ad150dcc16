use std::cmp::Ordering;

pub const DEFAULT_PAGE_LENGTH: usize = 25;

/// Grid the view controllers render into.
pub trait TableWidget: Send {
    /// Per-view display settings saved when another view takes the grid.
    type Options: Default + Send;

    fn set_columns(&mut self, columns: Vec<String>);
    fn replace_rows(&mut self, rows: Vec<Vec<String>>);
    fn set_caption(&mut self, caption: Option<String>);
    fn options(&self) -> Self::Options;
    /// Applies saved settings to the rows now loaded.
    fn restore_options(&mut self, options: Self::Options);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Page, sort and search term of one view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewOptions {
    pub page: usize,
    pub sort: Option<(usize, SortOrder)>,
    pub search: Option<String>,
}

/// In-memory paginated, sortable, searchable grid.
///
/// Sorting and the search term survive a row replacement; the page resets to
/// the first one.
#[derive(Debug, Clone)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
    caption: Option<String>,
    page_length: usize,
    page: usize,
    sort: Option<(usize, SortOrder)>,
    search: Option<String>,
}

impl Default for Table {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_LENGTH)
    }
}

impl Table {
    pub fn new(page_length: usize) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            caption: None,
            page_length: page_length.max(1),
            page: 0,
            sort: None,
            search: None,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn caption(&self) -> Option<&str> {
        self.caption.as_deref()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_length(&self) -> usize {
        self.page_length
    }

    pub fn sort(&self) -> Option<(usize, SortOrder)> {
        self.sort
    }

    /// Rows matching the search term, in display order.
    pub fn filtered_rows(&self) -> Vec<&Vec<String>> {
        let needle = self.search.as_ref().map(|term| term.to_lowercase());
        let mut rows: Vec<&Vec<String>> = self
            .rows
            .iter()
            .filter(|row| match &needle {
                Some(needle) => row
                    .iter()
                    .any(|cell| cell.to_lowercase().contains(needle.as_str())),
                None => true,
            })
            .collect();

        if let Some((column, order)) = self.sort {
            rows.sort_by(|a, b| {
                let ordering = compare_cells(
                    a.get(column).map(String::as_str).unwrap_or(""),
                    b.get(column).map(String::as_str).unwrap_or(""),
                );
                match order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            });
        }
        rows
    }

    pub fn page_count(&self) -> usize {
        let total = self.filtered_rows().len();
        total.div_ceil(self.page_length).max(1)
    }

    /// Rows on the current page.
    pub fn visible_rows(&self) -> Vec<&Vec<String>> {
        self.filtered_rows()
            .into_iter()
            .skip(self.page * self.page_length)
            .take(self.page_length)
            .collect()
    }

    /// Zero-based; clamps to the last page.
    pub fn set_page(&mut self, page: usize) {
        self.page = page.min(self.page_count() - 1);
    }

    pub fn next_page(&mut self) -> bool {
        if self.page + 1 < self.page_count() {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn previous_page(&mut self) -> bool {
        if self.page > 0 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn sort_by(&mut self, column: usize, order: SortOrder) -> bool {
        if column >= self.columns.len() {
            return false;
        }
        self.sort = Some((column, order));
        self.page = 0;
        true
    }

    /// Case-insensitive column lookup by title.
    pub fn column_index(&self, title: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|column| column.eq_ignore_ascii_case(title.trim()))
    }

    pub fn search(&mut self, term: Option<String>) {
        self.search = term
            .map(|term| term.trim().to_string())
            .filter(|term| !term.is_empty());
        self.page = 0;
    }

    /// `Showing 1 to 25 of 40 entries`.
    pub fn info(&self) -> String {
        let total = self.filtered_rows().len();
        if total == 0 {
            return "Showing 0 to 0 of 0 entries".to_string();
        }
        let start = self.page * self.page_length + 1;
        let end = (start + self.page_length - 1).min(total);
        let mut info = format!("Showing {start} to {end} of {total} entries");
        if self.search.is_some() {
            info.push_str(&format!(" (filtered from {} total entries)", self.rows.len()));
        }
        info
    }
}

impl TableWidget for Table {
    type Options = ViewOptions;

    fn set_columns(&mut self, columns: Vec<String>) {
        if self.columns != columns {
            self.sort = None;
        }
        self.columns = columns;
    }

    fn replace_rows(&mut self, rows: Vec<Vec<String>>) {
        self.rows = rows;
        self.page = 0;
    }

    fn set_caption(&mut self, caption: Option<String>) {
        self.caption = caption;
    }

    fn options(&self) -> ViewOptions {
        ViewOptions {
            page: self.page,
            sort: self.sort,
            search: self.search.clone(),
        }
    }

    fn restore_options(&mut self, options: ViewOptions) {
        self.sort = options
            .sort
            .filter(|(column, _)| *column < self.columns.len());
        self.search = options.search;
        self.page = options.page.min(self.page_count() - 1);
    }
}

fn compare_cells(a: &str, b: &str) -> Ordering {
    match (parse_number(a), parse_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_lowercase().cmp(&b.to_lowercase()),
    }
}

fn parse_number(cell: &str) -> Option<f64> {
    cell.trim().trim_end_matches('%').trim().parse::<f64>().ok()
}
