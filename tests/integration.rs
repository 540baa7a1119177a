//! End-to-end tests for the comanda engine.
//!
//! These drive full turns through `Chatbot::handle_turn`, from routing
//! through cart/state mutation to the order log, with the generative
//! fallback disabled so every reply is deterministic.

use std::sync::Arc;

use comanda::catalog::{Catalog, Price};
use comanda::config::ChatbotConfig;
use comanda::engine::Chatbot;
use comanda::llm::{FALLBACK_APOLOGY, FallbackClient};
use comanda::orders::OrderRecord;
use comanda::router::REFUSAL;
use comanda::state::OrderPhase;

const MENU_CSV: &str = "\
Category,Item,Serving Size,Price
Starters,Caesar Salad,bowl,8.50
Starters,Garlic Bread,4 slices,4.25
Mains,Margherita Pizza,12 inch,12.00
Mains,Wild Mushroom Risotto,plate,18.99
Drinks,Lemonade,16 oz,3.00
";

const AREAS_CSV: &str = "\
City,State short
Springfield,IL
Portland,OR
Riverside,CA
";

fn fixture_bot(dir: &tempfile::TempDir, collect_delivery: bool) -> Chatbot {
    let write = |name: &str, content: &str| {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    };
    let config = ChatbotConfig {
        menu_path: write("menu.csv", MENU_CSV),
        areas_path: write("areas.csv", AREAS_CSV),
        orders_path: dir.path().join("orders.jsonl"),
        collect_delivery,
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

fn read_orders(dir: &tempfile::TempDir) -> Vec<OrderRecord> {
    let content = match std::fs::read_to_string(dir.path().join("orders.jsonl")) {
        Ok(content) => content,
        Err(_) => return Vec::new(),
    };
    content
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}

#[test]
fn selecting_items_builds_the_cart() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("I'd like to order");
    assert_eq!(bot.session().phase(), OrderPhase::SelectingItems);

    let reply = bot.handle_turn("2 x caesar salad");
    assert!(reply.contains("17.00"), "reply was: {reply}");
    assert_eq!(bot.session().cart().quantity_of("Caesar Salad"), 2);
    assert_eq!(bot.session().cart().total(bot.catalog()), Price(1700));
}

#[test]
fn menu_inquiry_is_state_neutral() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    let reply = bot.handle_turn("¿me enseñas el menú?");
    for category in ["Starters", "Mains", "Drinks"] {
        assert!(reply.contains(category), "missing {category}: {reply}");
    }
    assert_eq!(bot.session().phase(), OrderPhase::Idle);
    assert!(bot.session().cart().is_empty());
}

#[test]
fn delivery_inquiry_fuzzy_matches_known_area() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    let reply = bot.handle_turn("entrega en Springfeld?");
    assert_eq!(reply, "Yes, we deliver to Springfield, IL.");
}

#[test]
fn unmatched_utterance_degrades_to_apology() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    let reply = bot.handle_turn("xyzzy nonsense query");
    assert_eq!(reply, FALLBACK_APOLOGY);
    assert_eq!(bot.session().phase(), OrderPhase::Idle);
    assert!(bot.session().cart().is_empty());
}

#[test]
fn confirmation_round_trip_appends_one_record() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("start my order");
    bot.handle_turn("2 x caesar salad and 1 x lemonade");
    let expected = bot.session().cart().total(bot.catalog());
    assert_eq!(expected, Price(2000));

    let reply = bot.handle_turn("done");
    assert_eq!(bot.session().phase(), OrderPhase::Confirming);
    assert!(reply.contains("yes/no"));

    let reply = bot.handle_turn("yes");
    assert!(reply.contains("20.00"), "reply was: {reply}");
    assert_eq!(bot.session().phase(), OrderPhase::Idle);
    assert!(bot.session().cart().is_empty());

    let records = read_orders(&dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].total(), expected);
    assert_eq!(records[0].lines.len(), 2);
}

#[test]
fn declining_confirmation_resumes_editing() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("order");
    bot.handle_turn("1 x lemonade");
    bot.handle_turn("done");
    let reply = bot.handle_turn("no");
    assert!(reply.contains("change"));
    assert_eq!(bot.session().phase(), OrderPhase::SelectingItems);
    // Cart survives the "no".
    assert_eq!(bot.session().cart().quantity_of("Lemonade"), 1);
    assert!(read_orders(&dir).is_empty());
}

#[test]
fn cancel_from_any_phase_resets_to_idle_with_empty_cart() {
    let dir = tempfile::TempDir::new().unwrap();

    // From selection.
    let mut bot = fixture_bot(&dir, false);
    bot.handle_turn("order");
    bot.handle_turn("1 x garlic bread");
    bot.handle_turn("cancel the order");
    assert_eq!(bot.session().phase(), OrderPhase::Idle);
    assert!(bot.session().cart().is_empty());

    // From confirmation.
    bot.handle_turn("order");
    bot.handle_turn("1 x garlic bread");
    bot.handle_turn("done");
    bot.handle_turn("cancel");
    assert_eq!(bot.session().phase(), OrderPhase::Idle);
    assert!(bot.session().cart().is_empty());
    assert!(read_orders(&dir).is_empty());
}

#[test]
fn moderation_short_circuits_regardless_of_phase() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    assert_eq!(bot.handle_turn("you stupid bot"), REFUSAL);

    bot.handle_turn("order");
    bot.handle_turn("1 x lemonade");
    assert_eq!(bot.handle_turn("this is stupid, show the menu"), REFUSAL);
    // The cart was not touched by the refused turn.
    assert_eq!(bot.session().cart().quantity_of("Lemonade"), 1);

    bot.handle_turn("done");
    assert_eq!(bot.handle_turn("stupid thing, yes"), REFUSAL);
    assert_eq!(bot.session().phase(), OrderPhase::Confirming);
}

#[test]
fn delivery_variant_collects_details_before_confirming() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, true);

    bot.handle_turn("order");
    bot.handle_turn("1 x wild mushroom risotto");
    let reply = bot.handle_turn("done");
    assert_eq!(bot.session().phase(), OrderPhase::CollectingDeliveryInfo);
    assert!(reply.contains("name, street address, and city"));

    // Unparseable details reprompt deterministically.
    let reply = bot.handle_turn("just bring it over");
    assert!(reply.contains("separated by commas"));
    assert_eq!(bot.session().phase(), OrderPhase::CollectingDeliveryInfo);

    let reply = bot.handle_turn("Ana López, 12 Main St, Riverside");
    assert_eq!(bot.session().phase(), OrderPhase::Confirming);
    assert!(reply.contains("Riverside, CA"));

    bot.handle_turn("yes");
    let records = read_orders(&dir);
    assert_eq!(records.len(), 1);
    let delivery = records[0].delivery.as_ref().unwrap();
    assert_eq!(delivery.name, "Ana López");
    assert_eq!(delivery.city, "Riverside, CA");
}

#[test]
fn remove_and_show_cart_during_selection() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("order");
    bot.handle_turn("2 x lemonade, 1 x caesar salad");
    let reply = bot.handle_turn("remove 1 x lemonade");
    assert!(reply.contains("Removed Lemonade"));
    assert_eq!(bot.session().cart().quantity_of("Lemonade"), 1);

    let reply = bot.handle_turn("show my cart");
    assert!(reply.contains("1 x Lemonade"));
    assert!(reply.contains("1 x Caesar Salad"));
    assert!(reply.contains("Total: 11.50"));
}

#[test]
fn implicit_item_candidate_while_selecting() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("order");
    // No quantity marker: the whole utterance is a qty-1 candidate.
    bot.handle_turn("margherita pizza");
    assert_eq!(bot.session().cart().quantity_of("Margherita Pizza"), 1);

    // An unresolvable utterance goes to the fallback instead.
    let reply = bot.handle_turn("surprise me with something");
    assert_eq!(reply, FALLBACK_APOLOGY);
    assert_eq!(bot.session().cart().quantity_of("Margherita Pizza"), 1);
}

#[test]
fn unknown_item_reported_with_users_words() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut bot = fixture_bot(&dir, false);

    bot.handle_turn("order");
    let reply = bot.handle_turn("2 x unicorn steak");
    assert!(reply.contains("\"unicorn steak\""), "reply was: {reply}");
    assert!(bot.session().cart().is_empty());
}
