//! Session state and action application.
//!
//! One [`Session`] per conversation: the order phase, the cart, a
//! delivery-details draft, and the transcript. Sessions are never
//! shared; the hosting surface owns exactly one per conversation and
//! drives it one utterance at a time. The catalog, by contrast, is
//! read-only and shareable.
//!
//! [`Session::apply`] executes a routed action and renders the reply.
//! It returns `None` only for `Unmatched`, which the engine forwards
//! to the fallback responder.

use crate::cart::{Cart, CartError};
use crate::catalog::Catalog;
use crate::config::ChatbotConfig;
use crate::conversation::Conversation;
use crate::orders::{OrderLog, OrderRecord};
use crate::router::{CartOp, RoutedAction};
use crate::state::{DeliveryDetails, OrderPhase, PhaseChange};

/// Mutable state for one conversation.
#[derive(Debug)]
pub struct Session {
    phase: OrderPhase,
    cart: Cart,
    delivery: Option<DeliveryDetails>,
    conversation: Conversation,
}

impl Session {
    pub fn new(max_transcript_turns: usize) -> Self {
        Self {
            phase: OrderPhase::Idle,
            cart: Cart::new(),
            delivery: None,
            conversation: Conversation::new(max_transcript_turns),
        }
    }

    pub fn phase(&self) -> OrderPhase {
        self.phase
    }

    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn conversation_mut(&mut self) -> &mut Conversation {
        &mut self.conversation
    }

    /// Apply a routed action. `None` means unmatched: the caller owns
    /// the fallback. Everything else resolves to a reply here, with
    /// cart and phase updated as a unit before the reply is returned.
    pub fn apply(
        &mut self,
        action: RoutedAction,
        catalog: &Catalog,
        orders: &OrderLog,
        config: &ChatbotConfig,
    ) -> Option<String> {
        match action {
            RoutedAction::DirectReply(text) => Some(text),
            RoutedAction::ShowCart => Some(self.cart.render(catalog)),
            RoutedAction::MutateCart(ops) => Some(self.apply_cart_ops(ops, catalog)),
            RoutedAction::StateTransition(change) => {
                Some(self.apply_transition(change, catalog, orders, config))
            }
            RoutedAction::Unmatched => None,
        }
    }

    fn apply_cart_ops(&mut self, ops: Vec<CartOp>, catalog: &Catalog) -> String {
        let mut parts: Vec<String> = Vec::new();
        for op in ops {
            match op {
                CartOp::Add { name, quantity } => {
                    match self.cart.add(catalog, &name, quantity) {
                        Ok(outcome) => parts.push(format!(
                            "Added {quantity} x {} (now {} in your cart).",
                            outcome.name, outcome.line_quantity
                        )),
                        Err(e) => parts.push(cart_error_reply(&e)),
                    }
                }
                CartOp::Remove { name, quantity } => {
                    match self.cart.remove(&name, quantity) {
                        Ok(canonical) => parts.push(format!("Removed {canonical}.")),
                        Err(e) => parts.push(cart_error_reply(&e)),
                    }
                }
            }
        }
        parts.push(format!(
            "Running total: {}. Say \"done\" when you're ready to confirm, or \"cancel\" to drop the order.",
            self.cart.total(catalog)
        ));
        parts.join("\n")
    }

    fn apply_transition(
        &mut self,
        change: PhaseChange,
        catalog: &Catalog,
        orders: &OrderLog,
        config: &ChatbotConfig,
    ) -> String {
        match change {
            PhaseChange::StartOrder => {
                self.phase = self.phase.next(&change, config.collect_delivery);
                "Great, let's get your order started. Tell me items as \"2 x caesar salad\"; \
                 ask for the menu any time."
                    .into()
            }
            PhaseChange::RequestConfirm => {
                // Nothing to confirm: stay where we are.
                if self.cart.is_empty() {
                    self.phase = OrderPhase::SelectingItems;
                    return "Your cart is empty. Add something first, like \"1 x lemonade\"."
                        .into();
                }
                self.phase = self.phase.next(&change, config.collect_delivery);
                match self.phase {
                    OrderPhase::CollectingDeliveryInfo => format!(
                        "{}\nWhere should we deliver? Please give your name, street address, and city, separated by commas.",
                        self.cart.render(catalog)
                    ),
                    _ => format!(
                        "{}\nShall I confirm the order? (yes/no)",
                        self.cart.render(catalog)
                    ),
                }
            }
            PhaseChange::ProvideDelivery(details) => {
                match catalog.resolve_delivery_area(&details.city) {
                    Some(area) => {
                        let confirmed = DeliveryDetails {
                            city: area.to_string(),
                            ..details
                        };
                        let summary = format!(
                            "Delivering to {} at {}, {}.",
                            confirmed.name, confirmed.address, confirmed.city
                        );
                        self.delivery = Some(confirmed);
                        self.phase = OrderPhase::Confirming;
                        format!(
                            "{summary}\n{}\nShall I confirm the order? (yes/no)",
                            self.cart.render(catalog)
                        )
                    }
                    None => format!(
                        "Sorry, we don't deliver to {}. Please give another city, or say \"cancel\".",
                        details.city
                    ),
                }
            }
            PhaseChange::Finalize => {
                let record =
                    OrderRecord::from_cart(&self.cart, catalog, self.delivery.take());
                let total = record.total();
                match orders.append(&record) {
                    Ok(()) => {
                        self.cart.clear();
                        self.phase = OrderPhase::Idle;
                        format!(
                            "Order confirmed! Your total is {total}. Thank you, see you soon."
                        )
                    }
                    Err(e) => {
                        // Keep the cart and phase so the user can retry.
                        tracing::error!(error = %e, "failed to record order");
                        self.delivery = record.delivery.clone();
                        "I couldn't record your order just now. Your cart is untouched; \
                         please try confirming again."
                            .into()
                    }
                }
            }
            PhaseChange::Resume => {
                self.phase = self.phase.next(&change, config.collect_delivery);
                "No problem. What would you like to change? You can add or remove items, \
                 or say \"cancel\" to drop the order."
                    .into()
            }
            PhaseChange::Abandon => {
                self.cart.clear();
                self.delivery = None;
                self.phase = OrderPhase::Idle;
                "Order cancelled. Let me know if you'd like to start again.".into()
            }
        }
    }
}

fn cart_error_reply(error: &CartError) -> String {
    match error {
        CartError::UnknownItem { requested } => {
            format!("I couldn't find \"{requested}\" on our menu.")
        }
        CartError::NotInCart { requested } => {
            format!("\"{requested}\" isn't in your cart, so there was nothing to remove.")
        }
        CartError::ZeroQuantity => "Quantities need to be at least 1.".into(),
    }
}
