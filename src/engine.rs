//! Chatbot facade: one session, one turn at a time.
//!
//! Owns the catalog, the session, the order log, and the fallback
//! client, and exposes a single [`Chatbot::handle_turn`] entry point.
//! A turn is processed to completion (reply computed, state updated)
//! before the next one is accepted; the only blocking network call is
//! the fallback request, bounded by its configured timeout.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::ChatbotConfig;
use crate::llm::FallbackClient;
use crate::orders::OrderLog;
use crate::router;
use crate::session::Session;

/// The restaurant chatbot engine.
pub struct Chatbot {
    config: ChatbotConfig,
    catalog: Arc<Catalog>,
    session: Session,
    orders: OrderLog,
    fallback: FallbackClient,
}

impl Chatbot {
    /// Create an engine from configuration.
    ///
    /// A failed catalog load is logged and degrades to an empty
    /// catalog: menu and delivery features apologize instead of
    /// answering, and the session keeps running.
    pub fn new(config: ChatbotConfig) -> Self {
        let catalog =
            match Catalog::load(&config.menu_path, &config.areas_path, config.fuzzy_threshold) {
                Ok((catalog, _report)) => catalog,
                Err(e) => {
                    tracing::warn!(error = %e, "catalog unavailable; starting degraded");
                    Catalog::empty()
                }
            };
        let fallback = FallbackClient::new(config.llm.clone());
        Self::with_parts(config, Arc::new(catalog), fallback)
    }

    /// Assemble an engine from pre-built parts. Used by tests and by
    /// hosts that share one catalog across sessions.
    pub fn with_parts(
        config: ChatbotConfig,
        catalog: Arc<Catalog>,
        fallback: FallbackClient,
    ) -> Self {
        let session = Session::new(config.max_transcript_turns);
        let orders = OrderLog::new(config.orders_path.clone());
        Self {
            config,
            catalog,
            session,
            orders,
            fallback,
        }
    }

    /// Process one utterance and return the reply. Never fails: every
    /// recognized error becomes a user-visible message, and unmatched
    /// utterances go to the fallback responder.
    pub fn handle_turn(&mut self, utterance: &str) -> String {
        let action = router::route(utterance, self.session.phase(), &self.catalog, &self.config);
        tracing::debug!(phase = %self.session.phase(), ?action, "routed");

        let reply = match self
            .session
            .apply(action, &self.catalog, &self.orders, &self.config)
        {
            Some(reply) => reply,
            None => {
                let context = self.fallback_context();
                self.fallback.respond(utterance, Some(&context))
            }
        };

        self.session
            .conversation_mut()
            .add_turn(utterance.to_string(), reply.clone());
        reply
    }

    /// Serialized snapshot sent with fallback requests: categories,
    /// cart, and the last few transcript turns.
    fn fallback_context(&self) -> String {
        let mut context = String::new();
        if self.catalog.has_menu() {
            context.push_str(&format!(
                "menu categories: {}\n",
                self.catalog.categories().join(", ")
            ));
        }
        context.push_str(&format!(
            "cart: {}\n",
            if self.session.cart().is_empty() {
                "empty".to_string()
            } else {
                self.session.cart().render(&self.catalog)
            }
        ));
        let recent = self.session.conversation().recent_context(4);
        if !recent.is_empty() {
            context.push_str("recent turns:\n");
            context.push_str(&recent);
        }
        context
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ChatbotConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FALLBACK_APOLOGY;
    use std::io::Write;

    fn fixture_bot(dir: &tempfile::TempDir) -> Chatbot {
        let write = |name: &str, content: &str| {
            let path = dir.path().join(name);
            std::fs::File::create(&path)
                .unwrap()
                .write_all(content.as_bytes())
                .unwrap();
            path
        };
        let menu = write(
            "menu.csv",
            "Category,Item,Serving Size,Price\n\
             Starters,Caesar Salad,bowl,8.50\n\
             Drinks,Lemonade,16 oz,3.00\n",
        );
        let areas = write("areas.csv", "City,State short\nSpringfield,IL\n");
        let config = ChatbotConfig {
            menu_path: menu,
            areas_path: areas,
            orders_path: dir.path().join("orders.jsonl"),
            ..ChatbotConfig::default()
        };
        let (catalog, _) = Catalog::load(
            &config.menu_path,
            &config.areas_path,
            config.fuzzy_threshold,
        )
        .unwrap();
        let fallback = FallbackClient::disabled(config.llm.clone());
        Chatbot::with_parts(config, Arc::new(catalog), fallback)
    }

    #[test]
    fn menu_turn_leaves_state_untouched() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bot = fixture_bot(&dir);

        let reply = bot.handle_turn("¿me enseñas el menú?");
        assert!(reply.contains("Caesar Salad"));
        assert!(bot.session().cart().is_empty());
        assert_eq!(bot.session().phase(), crate::state::OrderPhase::Idle);
    }

    #[test]
    fn unmatched_turn_uses_fallback_and_keeps_state() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut bot = fixture_bot(&dir);

        let reply = bot.handle_turn("xyzzy nonsense query");
        assert_eq!(reply, FALLBACK_APOLOGY);
        assert!(bot.session().cart().is_empty());
        assert_eq!(bot.session().phase(), crate::state::OrderPhase::Idle);
        // The turn still lands in the transcript.
        assert_eq!(bot.session().conversation().len(), 1);
    }

    #[test]
    fn missing_data_degrades_instead_of_crashing() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = ChatbotConfig {
            menu_path: dir.path().join("missing-menu.csv"),
            areas_path: dir.path().join("missing-areas.csv"),
            orders_path: dir.path().join("orders.jsonl"),
            ..ChatbotConfig::default()
        };
        let mut bot = Chatbot::new(config);
        let reply = bot.handle_turn("show me the menu");
        assert!(reply.contains("not available"));
    }
}
