//! comanda CLI: restaurant chat assistant.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use comanda::catalog::Catalog;
use comanda::config::ChatbotConfig;
use comanda::engine::Chatbot;

#[derive(Parser)]
#[command(name = "comanda", version, about = "Restaurant chat assistant")]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Menu CSV path (overrides the config file).
    #[arg(long, global = true)]
    menu: Option<PathBuf>,

    /// Delivery-area CSV path (overrides the config file).
    #[arg(long, global = true)]
    areas: Option<PathBuf>,

    /// Order log path (overrides the config file).
    #[arg(long, global = true)]
    orders: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat session on stdin/stdout.
    Chat,

    /// Print the menu and exit.
    Menu,

    /// Check whether a place is in the delivery area.
    Delivery {
        /// Place name, e.g. "Springfield" or "Springfield, IL".
        place: String,
    },

    /// Load the data files and report row counts.
    Validate,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = ChatbotConfig::load_or_default(cli.config.as_deref())?;
    if let Some(menu) = cli.menu {
        config.menu_path = menu;
    }
    if let Some(areas) = cli.areas {
        config.areas_path = areas;
    }
    if let Some(orders) = cli.orders {
        config.orders_path = orders;
    }

    match cli.command {
        Commands::Chat => run_chat(config),
        Commands::Menu => {
            let (catalog, _) =
                Catalog::load(&config.menu_path, &config.areas_path, config.fuzzy_threshold)?;
            println!("{}", catalog.render_menu());
            Ok(())
        }
        Commands::Delivery { place } => {
            let (catalog, _) =
                Catalog::load(&config.menu_path, &config.areas_path, config.fuzzy_threshold)?;
            match catalog.resolve_delivery_area(&place) {
                Some(area) => println!("Yes, we deliver to {area}."),
                None => println!("Sorry, we don't deliver to {place}."),
            }
            Ok(())
        }
        Commands::Validate => {
            let (catalog, report) =
                Catalog::load(&config.menu_path, &config.areas_path, config.fuzzy_threshold)?;
            println!("menu items:      {}", report.menu_rows);
            println!("rows skipped:    {}", report.menu_skipped);
            println!("delivery areas:  {}", report.delivery_areas);
            println!("categories:      {}", catalog.categories().join(", "));
            Ok(())
        }
    }
}

fn run_chat(config: ChatbotConfig) -> Result<()> {
    let mut bot = Chatbot::new(config);
    println!("Welcome to our virtual restaurant. How can I help you today?");
    println!("(type \"exit\" to leave)\n");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    loop {
        write!(stdout, "you> ").into_diagnostic()?;
        stdout.flush().into_diagnostic()?;

        let mut line = String::new();
        let read = stdin.lock().read_line(&mut line).into_diagnostic()?;
        if read == 0 {
            break; // EOF
        }
        let utterance = line.trim();
        if utterance.is_empty() {
            continue;
        }
        if utterance.eq_ignore_ascii_case("exit") || utterance.eq_ignore_ascii_case("quit") {
            break;
        }

        let reply = bot.handle_turn(utterance);
        println!("bot> {reply}\n");
    }
    println!("Goodbye!");
    Ok(())
}
