//! # comanda
//!
//! A deterministic intent-routing and order-state engine for a
//! restaurant chat assistant. Each utterance is answered by local
//! rules and data when possible and deferred to a hosted generative
//! model only when nothing matches.
//!
//! ## Architecture
//!
//! - **Catalog** (`catalog`): menu + delivery areas loaded once from
//!   CSV, read-only and shareable thereafter
//! - **Cart** (`cart`): session-scoped item → quantity mapping with
//!   catalog-derived totals
//! - **Router** (`router`): fixed-priority rule matching, first match
//!   wins
//! - **State machine** (`state`, `session`): closed order-phase enum
//!   gating which order-flow rules apply
//! - **Order log** (`orders`): append-only JSON Lines snapshots of
//!   confirmed orders
//! - **Fallback** (`llm`): the one non-deterministic boundary, a
//!   chat-completions call that degrades to a canned apology
//!
//! ## Library usage
//!
//! ```no_run
//! use comanda::config::ChatbotConfig;
//! use comanda::engine::Chatbot;
//!
//! let mut bot = Chatbot::new(ChatbotConfig::default());
//! let reply = bot.handle_turn("do you deliver to Springfield?");
//! println!("{reply}");
//! ```

pub mod cart;
pub mod catalog;
pub mod config;
pub mod conversation;
pub mod engine;
pub mod error;
pub mod llm;
pub mod orders;
pub mod router;
pub mod session;
pub mod state;
