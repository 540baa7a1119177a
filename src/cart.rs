//! The in-progress order for one session.
//!
//! A cart is a mapping from canonical item name to quantity. Quantities
//! are always positive: a line decremented to zero is removed, never
//! stored. Totals are recomputed from the catalog on every call since
//! the catalog is authoritative for prices.

use std::collections::BTreeMap;

use miette::Diagnostic;
use thiserror::Error;

use crate::catalog::{Catalog, Price};

// ── Errors ──────────────────────────────────────────────────────────────

/// Errors from cart operations. All of these are recoverable and are
/// reported back to the user as text, never escalated.
#[derive(Debug, Error, Diagnostic)]
pub enum CartError {
    /// The `requested` field carries the user's original wording so the
    /// reply echoes words they will recognize.
    #[error("unknown menu item: \"{requested}\"")]
    #[diagnostic(
        code(comanda::cart::unknown_item),
        help("The name must match a menu item (case-insensitive).")
    )]
    UnknownItem { requested: String },

    #[error("\"{requested}\" is not in the cart")]
    #[diagnostic(
        code(comanda::cart::not_in_cart),
        help("Removing an item that was never added is reported, not fatal.")
    )]
    NotInCart { requested: String },

    #[error("quantity must be a positive integer")]
    #[diagnostic(
        code(comanda::cart::zero_quantity),
        help("Use a quantity of 1 or more; to drop a line, remove it instead.")
    )]
    ZeroQuantity,
}

pub type CartResult<T> = std::result::Result<T, CartError>;

/// Result of a successful add: the canonical item name, the line's new
/// quantity, and the new running total.
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub name: String,
    pub line_quantity: u32,
    pub total: Price,
}

// ── Cart ────────────────────────────────────────────────────────────────

/// Mutable, session-scoped order state. Created empty, cleared on
/// confirmation or cancellation.
#[derive(Debug, Default)]
pub struct Cart {
    /// Canonical item name → quantity (> 0).
    lines: BTreeMap<String, u32>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `quantity` of the named item. The name is resolved against
    /// the catalog case-insensitively and stored under its canonical
    /// spelling; an existing line is incremented.
    pub fn add(
        &mut self,
        catalog: &Catalog,
        requested: &str,
        quantity: u32,
    ) -> CartResult<AddOutcome> {
        if quantity == 0 {
            return Err(CartError::ZeroQuantity);
        }
        let item = catalog
            .find_item(requested)
            .ok_or_else(|| CartError::UnknownItem {
                requested: requested.trim().to_string(),
            })?;
        let line = self.lines.entry(item.name.clone()).or_insert(0);
        *line += quantity;
        Ok(AddOutcome {
            name: item.name.clone(),
            line_quantity: *line,
            total: self.total(catalog),
        })
    }

    /// Remove an item line, or part of it. `None` removes the whole
    /// line; a quantity at or above the line's quantity also removes
    /// it; otherwise the line is decremented.
    pub fn remove(&mut self, requested: &str, quantity: Option<u32>) -> CartResult<String> {
        let folded = crate::catalog::casefold(requested.trim());
        let key = self
            .lines
            .keys()
            .find(|name| crate::catalog::casefold(name) == folded)
            .cloned()
            .ok_or_else(|| CartError::NotInCart {
                requested: requested.trim().to_string(),
            })?;

        match (quantity, self.lines.get_mut(&key)) {
            (Some(0), _) => return Err(CartError::ZeroQuantity),
            (Some(n), Some(line)) if n < *line => *line -= n,
            _ => {
                self.lines.remove(&key);
            }
        }
        Ok(key)
    }

    /// Sum of quantity times unit price, recomputed from the catalog.
    /// Lines whose item is missing from the catalog contribute zero.
    pub fn total(&self, catalog: &Catalog) -> Price {
        let cents = self
            .lines
            .iter()
            .filter_map(|(name, qty)| {
                catalog
                    .find_item(name)
                    .map(|item| item.price.cents() * qty)
            })
            .sum();
        Price(cents)
    }

    /// Empty the cart unconditionally. Used by both the confirm and
    /// cancel paths.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Lines in stable (sorted) order.
    pub fn lines(&self) -> impl Iterator<Item = (&str, u32)> {
        self.lines.iter().map(|(name, qty)| (name.as_str(), *qty))
    }

    /// Quantity of one line, 0 when absent. Mostly for tests.
    pub fn quantity_of(&self, name: &str) -> u32 {
        let folded = crate::catalog::casefold(name);
        self.lines
            .iter()
            .find(|(k, _)| crate::catalog::casefold(k) == folded)
            .map(|(_, q)| *q)
            .unwrap_or(0)
    }

    /// Render the cart as user-facing text with per-line subtotals.
    pub fn render(&self, catalog: &Catalog) -> String {
        if self.is_empty() {
            return "Your cart is empty.".into();
        }
        let mut out = String::from("Your order so far:\n");
        for (name, qty) in self.lines() {
            match catalog.find_item(name) {
                Some(item) => out.push_str(&format!(
                    "  - {qty} x {name}: {}\n",
                    Price(item.price.cents() * qty)
                )),
                None => out.push_str(&format!("  - {qty} x {name}\n")),
            }
        }
        out.push_str(&format!("Total: {}", self.total(catalog)));
        out
    }
}
