//! The conversation state machine for the order flow.
//!
//! A session is always in exactly one [`OrderPhase`]. Phase-agnostic
//! queries (menu, delivery, hours, specials) are answered in every
//! phase; order-flow rules are gated on the current phase by the
//! router. Transitions are modeled as a closed [`PhaseChange`] enum so
//! every consumer matches exhaustively.

use serde::{Deserialize, Serialize};

/// Where the session is in the order flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderPhase {
    /// No order in progress.
    #[default]
    Idle,
    /// Collecting order lines into the cart.
    SelectingItems,
    /// Waiting for name, street address, and city.
    CollectingDeliveryInfo,
    /// Waiting for a yes/no on the assembled order.
    Confirming,
}

impl OrderPhase {
    /// The phase reached by applying a transition.
    ///
    /// `collect_delivery` selects the flow variant: when true, a
    /// confirm request detours through delivery-info collection.
    pub fn next(self, change: &PhaseChange, collect_delivery: bool) -> OrderPhase {
        match change {
            PhaseChange::StartOrder => OrderPhase::SelectingItems,
            PhaseChange::RequestConfirm => {
                if collect_delivery {
                    OrderPhase::CollectingDeliveryInfo
                } else {
                    OrderPhase::Confirming
                }
            }
            PhaseChange::ProvideDelivery(_) => OrderPhase::Confirming,
            PhaseChange::Resume => OrderPhase::SelectingItems,
            PhaseChange::Finalize | PhaseChange::Abandon => OrderPhase::Idle,
        }
    }
}

impl std::fmt::Display for OrderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderPhase::Idle => "idle",
            OrderPhase::SelectingItems => "selecting-items",
            OrderPhase::CollectingDeliveryInfo => "collecting-delivery-info",
            OrderPhase::Confirming => "confirming",
        };
        f.write_str(name)
    }
}

/// A requested order-flow transition, produced by the router and
/// applied by the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseChange {
    /// Begin a new order.
    StartOrder,
    /// The user is done selecting; move to confirmation (or delivery
    /// collection, per variant).
    RequestConfirm,
    /// Delivery details were provided while collecting them.
    ProvideDelivery(DeliveryDetails),
    /// Affirmative at confirmation: write the order and reset.
    Finalize,
    /// Negative at confirmation: back to editing the cart.
    Resume,
    /// Explicit cancel from any phase: drop the order and reset.
    Abandon,
}

/// Delivery contact details collected during the order flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryDetails {
    pub name: String,
    pub address: String,
    pub city: String,
}

impl DeliveryDetails {
    /// Parse "name, street address, city" from one utterance. All
    /// three comma-separated fields must be non-empty.
    pub fn parse(utterance: &str) -> Option<Self> {
        let parts: Vec<&str> = utterance.split(',').map(str::trim).collect();
        match parts.as_slice() {
            [name, address, city] if !name.is_empty() && !address.is_empty() && !city.is_empty() => {
                Some(Self {
                    name: name.to_string(),
                    address: address.to_string(),
                    city: city.to_string(),
                })
            }
            _ => None,
        }
    }
}
