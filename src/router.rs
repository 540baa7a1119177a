//! Intent routing: deterministic first, generative last.
//!
//! [`route`] inspects one utterance against a fixed priority list of
//! rules and decides whether it can be answered locally (catalog
//! reads, cart mutations, order-flow transitions) or must defer to the
//! fallback responder. First match wins; rules never combine.
//!
//! Priority order: moderation, menu inquiry, delivery inquiry,
//! hours/special inquiry, phase-gated order flow, unmatched.
//!
//! The order-line lexer is deliberately narrow: `<integer> x <name>`,
//! repeated, with names running up to the next quantity marker. No
//! further natural-language parsing is attempted; anything the lexer
//! and keyword rules cannot place falls through to the fallback.

use std::sync::OnceLock;

use regex::Regex;

use crate::catalog::{Catalog, casefold};
use crate::config::ChatbotConfig;
use crate::state::{DeliveryDetails, OrderPhase, PhaseChange};

/// Fixed refusal for denylisted utterances.
pub const REFUSAL: &str =
    "Let's keep things friendly. I can help with our menu, delivery areas, hours, or an order.";

/// What the router decided for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutedAction {
    /// Answerable read-only; the reply is final as-is.
    DirectReply(String),
    /// Parsed cart mutations; the session applies them and renders the
    /// reply with the running total.
    MutateCart(Vec<CartOp>),
    /// Render the live cart.
    ShowCart,
    /// An order-flow transition; the session applies it.
    StateTransition(PhaseChange),
    /// No rule matched; defer to the fallback responder.
    Unmatched,
}

/// One parsed cart mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartOp {
    Add { name: String, quantity: u32 },
    Remove { name: String, quantity: Option<u32> },
}

// ── Keyword tables ──────────────────────────────────────────────────────
//
// All tables hold casefolded forms (accents stripped), in English and
// Spanish since the bot serves both.

const MENU_KEYWORDS: &[&str] = &["menu", "carta"];
const DELIVERY_KEYWORDS: &[&str] = &["delivery", "deliver", "entrega", "reparto"];
const HOURS_KEYWORDS: &[&str] = &["hours", "horario", "schedule"];
const SPECIAL_KEYWORDS: &[&str] = &["special", "especial"];

const START_WORDS: &[&str] = &["order", "pedido", "pedir", "ordenar", "start"];
const CONFIRM_WORDS: &[&str] = &["done", "confirm", "confirmar", "listo", "checkout", "finish"];
const CANCEL_WORDS: &[&str] = &["cancel", "cancelar"];
const CART_WORDS: &[&str] = &["cart", "carrito"];
const YES_WORDS: &[&str] = &["yes", "si", "yep", "sure", "confirm", "confirmar", "ok"];
const NO_WORDS: &[&str] = &["no", "nope"];

fn contains_any(folded: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| folded.contains(k))
}

fn has_word(folded: &str, words: &[&str]) -> bool {
    folded
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .any(|t| words.contains(&t))
}

fn quantity_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(\d+)\s*x\s*").unwrap())
}

fn remove_command() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:remove|quitar?|eliminar?)\s+(?:(\d+)\s*x?\s*)?(.+)$").unwrap()
    })
}

fn place_after_preposition() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(?:to|in|a|en)\s+([\p{L}][\p{L}\d .,'-]*)").unwrap())
}

// ── Routing ─────────────────────────────────────────────────────────────

/// Route one utterance. Pure: reads the catalog and config, touches no
/// session state. `phase` gates which order-flow rules are active.
pub fn route(
    utterance: &str,
    phase: OrderPhase,
    catalog: &Catalog,
    config: &ChatbotConfig,
) -> RoutedAction {
    let trimmed = utterance.trim();
    if trimmed.is_empty() {
        return RoutedAction::Unmatched;
    }
    let folded = casefold(trimmed);

    // 1. Moderation short-circuits everything, in every phase.
    if config
        .denylist
        .iter()
        .any(|term| folded.contains(&casefold(term)))
    {
        return RoutedAction::DirectReply(REFUSAL.into());
    }

    // 2. Menu inquiry: full menu, or one category if named.
    if contains_any(&folded, MENU_KEYWORDS) {
        for category in catalog.categories() {
            if folded.contains(&casefold(category)) {
                if let Some(text) = catalog.render_category(category) {
                    return RoutedAction::DirectReply(text);
                }
            }
        }
        return RoutedAction::DirectReply(catalog.render_menu());
    }

    // 3. Delivery inquiry.
    if contains_any(&folded, DELIVERY_KEYWORDS) {
        return delivery_reply(trimmed, catalog);
    }

    // 4. Hours and daily special: static content, not catalog-derived.
    if contains_any(&folded, HOURS_KEYWORDS) {
        return RoutedAction::DirectReply(config.hours_text.clone());
    }
    if contains_any(&folded, SPECIAL_KEYWORDS) {
        return RoutedAction::DirectReply(config.special_text.clone());
    }

    // 5. Order flow, gated on the current phase.
    match phase {
        OrderPhase::Idle => {
            if has_word(&folded, CANCEL_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Abandon);
            }
            if has_word(&folded, START_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::StartOrder);
            }
        }
        OrderPhase::SelectingItems => {
            if has_word(&folded, CANCEL_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Abandon);
            }
            if has_word(&folded, CONFIRM_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::RequestConfirm);
            }
            if has_word(&folded, CART_WORDS) {
                return RoutedAction::ShowCart;
            }
            if let Some(caps) = remove_command().captures(trimmed) {
                let quantity = caps.get(1).and_then(|m| m.as_str().parse().ok());
                if let Some(name) = caps.get(2) {
                    return RoutedAction::MutateCart(vec![CartOp::Remove {
                        name: name.as_str().trim().to_string(),
                        quantity,
                    }]);
                }
            }
            let lines = parse_order_lines(trimmed);
            if !lines.is_empty() {
                return RoutedAction::MutateCart(
                    lines
                        .into_iter()
                        .map(|(quantity, name)| CartOp::Add { name, quantity })
                        .collect(),
                );
            }
            // Best-effort degradation: no quantity markers while item
            // selection is expected, so the whole utterance becomes one
            // implicit quantity-1 candidate. Routed only if it resolves.
            if let Some(item) = catalog
                .find_item(trimmed)
                .or_else(|| catalog.find_item_fuzzy(trimmed))
            {
                return RoutedAction::MutateCart(vec![CartOp::Add {
                    name: item.name.clone(),
                    quantity: 1,
                }]);
            }
        }
        OrderPhase::CollectingDeliveryInfo => {
            if has_word(&folded, CANCEL_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Abandon);
            }
            if let Some(details) = DeliveryDetails::parse(trimmed) {
                return RoutedAction::StateTransition(PhaseChange::ProvideDelivery(details));
            }
            return RoutedAction::DirectReply(
                "Please give your name, street address, and city, separated by commas.".into(),
            );
        }
        OrderPhase::Confirming => {
            if has_word(&folded, CANCEL_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Abandon);
            }
            if has_word(&folded, YES_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Finalize);
            }
            if has_word(&folded, NO_WORDS) {
                return RoutedAction::StateTransition(PhaseChange::Resume);
            }
            if has_word(&folded, CART_WORDS) {
                return RoutedAction::ShowCart;
            }
        }
    }

    // 6. Nothing matched.
    RoutedAction::Unmatched
}

// ── Delivery place extraction ───────────────────────────────────────────

fn delivery_reply(utterance: &str, catalog: &Catalog) -> RoutedAction {
    if catalog.sample_delivery_areas(1).is_empty() {
        return RoutedAction::DirectReply(
            "Sorry, delivery information is not available right now.".into(),
        );
    }

    if let Some((candidate, resolved)) = extract_place(utterance, catalog) {
        let reply = match resolved {
            Some(area) => format!("Yes, we deliver to {area}."),
            None => format!(
                "Sorry, we don't deliver to {candidate}. Ask me for a list of delivery areas if you'd like some options."
            ),
        };
        return RoutedAction::DirectReply(reply);
    }

    let sample = catalog.sample_delivery_areas(20);
    RoutedAction::DirectReply(format!(
        "We deliver to these areas (among others):\n{}",
        sample.join(", ")
    ))
}

/// Extract a place-name candidate from a delivery inquiry.
///
/// First a regex capture after a preposition (trailing words are
/// stripped one at a time until the rest resolves), then a scan of
/// 1-3 token windows against the known area set. Returns the candidate
/// text and its resolution, or `None` when no candidate was found.
fn extract_place<'c>(
    utterance: &str,
    catalog: &'c Catalog,
) -> Option<(String, Option<&'c str>)> {
    if let Some(caps) = place_after_preposition().captures(utterance) {
        if let Some(m) = caps.get(1) {
            let candidate = m
                .as_str()
                .trim_end_matches(['.', ',', '?', '!', ' '])
                .to_string();
            let tokens: Vec<&str> = candidate.split_whitespace().collect();
            for end in (1..=tokens.len()).rev() {
                let prefix = tokens[..end].join(" ");
                if let Some(area) = catalog.resolve_delivery_area(&prefix) {
                    return Some((prefix, Some(area)));
                }
            }
            return Some((candidate, None));
        }
    }

    // No preposition capture: slide token windows over the utterance.
    let tokens: Vec<String> = utterance
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    for width in (1..=3.min(tokens.len())).rev() {
        for window in tokens.windows(width) {
            let candidate = window.join(" ");
            if let Some(area) = catalog.resolve_delivery_area(&candidate) {
                return Some((candidate, Some(area)));
            }
        }
    }
    None
}

// ── Order-line lexer ────────────────────────────────────────────────────

/// Lex `<integer> x <name>` lines out of an utterance.
///
/// Each quantity marker opens a line whose name runs to the next
/// marker; trailing separators (commas, "and", "y") are stripped.
/// "2 x chicken and 3 x fries" yields [(2, "chicken"), (3, "fries")].
fn parse_order_lines(utterance: &str) -> Vec<(u32, String)> {
    let markers: Vec<(usize, usize, u32)> = quantity_marker()
        .captures_iter(utterance)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let quantity = caps.get(1)?.as_str().parse().ok()?;
            Some((whole.start(), whole.end(), quantity))
        })
        .collect();

    let mut lines = Vec::new();
    for (i, &(_, name_start, quantity)) in markers.iter().enumerate() {
        let name_end = markers
            .get(i + 1)
            .map(|&(next_start, _, _)| next_start)
            .unwrap_or(utterance.len());
        let name = trim_separators(&utterance[name_start..name_end]);
        if !name.is_empty() && quantity > 0 {
            lines.push((quantity, name.to_string()));
        }
    }
    lines
}

fn trim_separators(raw: &str) -> &str {
    let mut name = raw.trim().trim_end_matches([',', ';', '.']).trim_end();
    for separator in [" and", " y", " e"] {
        if let Some(stripped) = name.strip_suffix(separator) {
            name = stripped.trim_end();
        }
    }
    name
}
