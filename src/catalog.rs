//! Menu catalog and delivery-area reference data.
//!
//! The catalog is loaded once per session from flat CSV files and is
//! read-only afterwards, so it can be shared across sessions behind an
//! `Arc`. Loading is partial-data tolerant: a malformed row is skipped
//! with a warning instead of failing the whole load.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from the catalog subsystem.
#[derive(Debug, Error, Diagnostic)]
pub enum CatalogError {
    #[error("data file not found: {path}")]
    #[diagnostic(
        code(comanda::catalog::not_found),
        help("Check the path in the config file or pass --menu/--areas explicitly.")
    )]
    DataNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed data file \"{path}\": {message}")]
    #[diagnostic(
        code(comanda::catalog::schema),
        help("The first row must be a header naming the required columns.")
    )]
    Schema { path: String, message: String },
}

pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

// ── Prices ──────────────────────────────────────────────────────────────

/// A non-negative unit price in integer cents.
///
/// Parsed from decimal strings like `8.50`, `$8.50`, or `18`; stored as
/// cents so cart totals are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub u32);

impl Price {
    /// Total cents.
    pub fn cents(self) -> u32 {
        self.0
    }

    /// Parse a decimal price string. Accepts an optional leading `$`
    /// and at most two fraction digits. Returns `None` for anything
    /// that is not a non-negative decimal number.
    pub fn parse(raw: &str) -> Option<Price> {
        let s = raw.trim().trim_start_matches('$').trim();
        if s.is_empty() {
            return None;
        }
        let (dollars, fraction) = match s.split_once('.') {
            Some((d, f)) => (d, f),
            None => (s, ""),
        };
        if fraction.len() > 2 || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let dollars: u32 = dollars.parse().ok()?;
        let cents = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u32>().ok()? * 10,
            _ => fraction.parse::<u32>().ok()?,
        };
        dollars
            .checked_mul(100)
            .and_then(|d| d.checked_add(cents))
            .map(Price)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ── Menu items ──────────────────────────────────────────────────────────

/// A single menu item. Immutable once loaded; owned by the catalog and
/// referenced by name everywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuItem {
    pub category: String,
    pub name: String,
    pub serving_size: String,
    pub price: Price,
}

/// Row counts from a catalog load, reported by `comanda validate`.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub menu_rows: usize,
    pub menu_skipped: usize,
    pub delivery_areas: usize,
    pub areas_skipped: usize,
}

// ── Text folding ────────────────────────────────────────────────────────

/// Casefold for matching: NFKD-decompose, drop combining marks,
/// lowercase. Makes "Menú" compare equal to "menu".
pub fn casefold(s: &str) -> String {
    s.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

// ── Catalog ─────────────────────────────────────────────────────────────

/// Read-only menu + delivery-area reference data for a session.
///
/// Invariants: every category has at least one item, and item names are
/// unique case-insensitively across the whole catalog (a later
/// colliding row is skipped at load time).
#[derive(Debug)]
pub struct Catalog {
    /// Categories in file order.
    categories: Vec<String>,
    by_category: HashMap<String, Vec<MenuItem>>,
    /// Casefolded item name → (category, index into its item list).
    name_index: HashMap<String, (String, usize)>,
    /// Delivery areas in file order, e.g. "Springfield, IL".
    delivery_areas: Vec<String>,
    area_index: HashSet<String>,
    fuzzy_threshold: f64,
}

impl Catalog {
    /// An empty catalog, used when data files are missing so the
    /// session can still run with degraded capability.
    pub fn empty() -> Self {
        Self {
            categories: Vec::new(),
            by_category: HashMap::new(),
            name_index: HashMap::new(),
            delivery_areas: Vec::new(),
            area_index: HashSet::new(),
            fuzzy_threshold: crate::config::DEFAULT_FUZZY_THRESHOLD,
        }
    }

    /// Load the catalog from a menu CSV and a delivery-area CSV.
    ///
    /// The menu file needs `Category`, `Item`, `Serving Size`, and
    /// `Price` columns (header-matched case-insensitively; extra
    /// columns such as nutrition data are ignored). The delivery file
    /// needs a `City` column and may carry a `State short` column.
    /// Rows that fail to parse are skipped with a warning.
    pub fn load(
        menu_path: &Path,
        areas_path: &Path,
        fuzzy_threshold: f64,
    ) -> CatalogResult<(Self, LoadReport)> {
        let mut catalog = Self::empty();
        catalog.fuzzy_threshold = fuzzy_threshold;
        let mut report = LoadReport::default();

        catalog.load_menu(menu_path, &mut report)?;
        catalog.load_areas(areas_path, &mut report)?;

        tracing::info!(
            items = report.menu_rows,
            skipped = report.menu_skipped,
            areas = report.delivery_areas,
            "catalog loaded"
        );
        Ok((catalog, report))
    }

    fn load_menu(&mut self, path: &Path, report: &mut LoadReport) -> CatalogResult<()> {
        let rows = read_csv(path)?;
        let header = rows.first().ok_or_else(|| CatalogError::Schema {
            path: path.display().to_string(),
            message: "file is empty".into(),
        })?;

        let required = ["Category", "Item", "Serving Size", "Price"];
        let mut cols = [0usize; 4];
        for (i, name) in required.iter().enumerate() {
            cols[i] = column(header, name).ok_or_else(|| CatalogError::Schema {
                path: path.display().to_string(),
                message: format!("missing required column \"{name}\""),
            })?;
        }
        let [cat_col, item_col, serving_col, price_col] = cols;

        for (line_no, row) in rows.iter().enumerate().skip(1) {
            match parse_menu_row(row, cat_col, item_col, serving_col, price_col) {
                Ok(item) => {
                    let key = casefold(&item.name);
                    if self.name_index.contains_key(&key) {
                        tracing::warn!(
                            line = line_no + 1,
                            item = %item.name,
                            "skipping duplicate item name"
                        );
                        report.menu_skipped += 1;
                        continue;
                    }
                    if !self.by_category.contains_key(&item.category) {
                        self.categories.push(item.category.clone());
                    }
                    let items = self.by_category.entry(item.category.clone()).or_default();
                    self.name_index
                        .insert(key, (item.category.clone(), items.len()));
                    items.push(item);
                    report.menu_rows += 1;
                }
                Err(message) => {
                    tracing::warn!(line = line_no + 1, "skipping malformed menu row: {message}");
                    report.menu_skipped += 1;
                }
            }
        }
        Ok(())
    }

    fn load_areas(&mut self, path: &Path, report: &mut LoadReport) -> CatalogResult<()> {
        let rows = read_csv(path)?;
        let header = rows.first().ok_or_else(|| CatalogError::Schema {
            path: path.display().to_string(),
            message: "file is empty".into(),
        })?;

        let city_col = column(header, "City").ok_or_else(|| CatalogError::Schema {
            path: path.display().to_string(),
            message: "missing required column \"City\"".into(),
        })?;
        let state_col = column(header, "State short");

        for (line_no, row) in rows.iter().enumerate().skip(1) {
            let city = row.get(city_col).map(|s| s.trim()).unwrap_or_default();
            if city.is_empty() {
                tracing::warn!(line = line_no + 1, "skipping delivery row without a city");
                report.areas_skipped += 1;
                continue;
            }
            let area = match state_col.and_then(|c| row.get(c)).map(|s| s.trim()) {
                Some(state) if !state.is_empty() => format!("{city}, {state}"),
                _ => city.to_string(),
            };
            if self.area_index.insert(casefold(&area)) {
                self.delivery_areas.push(area);
                report.delivery_areas += 1;
            }
        }
        Ok(())
    }

    /// Category names in file order.
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// Items of one category, matched case-insensitively.
    pub fn items_in_category(&self, category: &str) -> Option<&[MenuItem]> {
        let folded = casefold(category);
        self.categories
            .iter()
            .find(|c| casefold(c) == folded)
            .and_then(|c| self.by_category.get(c))
            .map(Vec::as_slice)
    }

    /// Case-insensitive exact item lookup.
    pub fn find_item(&self, name: &str) -> Option<&MenuItem> {
        let (category, idx) = self.name_index.get(&casefold(name.trim()))?;
        self.by_category.get(category)?.get(*idx)
    }

    /// Best fuzzy item match at or above the similarity threshold.
    pub fn find_item_fuzzy(&self, name: &str) -> Option<&MenuItem> {
        let folded = casefold(name.trim());
        if folded.is_empty() {
            return None;
        }
        let (key, score) = self
            .name_index
            .keys()
            .map(|k| (k, strsim::jaro_winkler(&folded, k)))
            .max_by(|a, b| a.1.total_cmp(&b.1))?;
        if score < self.fuzzy_threshold {
            return None;
        }
        let (category, idx) = &self.name_index[key];
        self.by_category.get(category)?.get(*idx)
    }

    /// Whether an utterance fragment names a covered delivery area.
    pub fn is_delivery_area(&self, place: &str) -> bool {
        self.resolve_delivery_area(place).is_some()
    }

    /// Resolve a place name to its canonical delivery-area string.
    ///
    /// Tries a casefolded exact match first, then the best fuzzy match
    /// at or above the threshold against both the full "City, ST" form
    /// and the bare city name, so misspellings and missing state
    /// abbreviations still resolve.
    pub fn resolve_delivery_area(&self, place: &str) -> Option<&str> {
        let folded = casefold(place.trim());
        if folded.is_empty() {
            return None;
        }
        if self.area_index.contains(&folded) {
            return self
                .delivery_areas
                .iter()
                .find(|a| casefold(a) == folded)
                .map(String::as_str);
        }

        let mut best: Option<(&str, f64)> = None;
        for area in &self.delivery_areas {
            let full = casefold(area);
            let city_only = full.split(',').next().unwrap_or(&full).trim().to_string();
            let score = strsim::jaro_winkler(&folded, &full)
                .max(strsim::jaro_winkler(&folded, &city_only));
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((area, score));
            }
        }
        match best {
            Some((area, score)) if score >= self.fuzzy_threshold => Some(area),
            _ => None,
        }
    }

    /// The first `n` delivery areas, for "where do you deliver?" replies.
    pub fn sample_delivery_areas(&self, n: usize) -> &[String] {
        &self.delivery_areas[..self.delivery_areas.len().min(n)]
    }

    /// Whether any menu data is loaded.
    pub fn has_menu(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Render the whole menu grouped by category.
    pub fn render_menu(&self) -> String {
        if !self.has_menu() {
            return "Sorry, the menu is not available right now.".into();
        }
        let mut out = String::from("Here is our menu:\n");
        for category in &self.categories {
            out.push('\n');
            out.push_str(category);
            out.push('\n');
            if let Some(items) = self.by_category.get(category) {
                for item in items {
                    out.push_str(&format!(
                        "  - {} ({}): {}\n",
                        item.name, item.serving_size, item.price
                    ));
                }
            }
        }
        out
    }

    /// Render a single category, matched case-insensitively.
    pub fn render_category(&self, category: &str) -> Option<String> {
        let items = self.items_in_category(category)?;
        let canonical = &items.first()?.category;
        let mut out = format!("{canonical}:\n");
        for item in items {
            out.push_str(&format!(
                "  - {} ({}): {}\n",
                item.name, item.serving_size, item.price
            ));
        }
        Some(out)
    }
}

fn parse_menu_row(
    row: &[String],
    cat_col: usize,
    item_col: usize,
    serving_col: usize,
    price_col: usize,
) -> Result<MenuItem, String> {
    let field = |col: usize, name: &str| -> Result<&str, String> {
        let value = row.get(col).map(|s| s.trim()).unwrap_or_default();
        if value.is_empty() {
            Err(format!("missing {name}"))
        } else {
            Ok(value)
        }
    };
    let category = field(cat_col, "category")?;
    let name = field(item_col, "item name")?;
    let serving = field(serving_col, "serving size")?;
    let raw_price = field(price_col, "price")?;
    let price =
        Price::parse(raw_price).ok_or_else(|| format!("unparseable price \"{raw_price}\""))?;
    Ok(MenuItem {
        category: category.to_string(),
        name: name.to_string(),
        serving_size: serving.to_string(),
        price,
    })
}

// ── CSV reading ─────────────────────────────────────────────────────────

fn read_csv(path: &Path) -> CatalogResult<Vec<Vec<String>>> {
    let content = std::fs::read_to_string(path).map_err(|source| CatalogError::DataNotFound {
        path: path.display().to_string(),
        source,
    })?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(split_csv_line)
        .collect())
}

/// Split one CSV line into fields. Handles double-quoted fields with
/// doubled-quote escapes; no multi-line fields.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut field));
            }
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}

/// Find a column index by case-insensitive header name.
fn column(header: &[String], name: &str) -> Option<usize> {
    let folded = casefold(name);
    header.iter().position(|h| casefold(h) == folded)
}
