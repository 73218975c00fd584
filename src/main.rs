mod app;
mod cards;
mod config;
mod error;
mod money;
mod plan;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::{File, OpenOptions};
use std::io;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use app::{App, Popup};
use cards::{Card, CardCollection, CardStore, NewCard};
use config::AppConfig;
use error::ValidationError;
use money::Money;
use plan::RechargeOption;

#[derive(Parser, Debug)]
#[command(name = "rechargecard")]
#[command(version)]
#[command(about = "Plan top-ups for prepaid transit cards")]
struct Args {
    /// Print every card and its recharge plan as JSON
    #[arg(short, long)]
    list: bool,

    /// Print the recharge plan of one card
    #[arg(short, long, value_name = "KEY")]
    plan: Option<u64>,

    /// Add a card from --balance, --outward and --return-price
    #[arg(short, long, requires_all = ["balance", "outward", "return_price"])]
    add: bool,

    /// Print the recharge plan for the given amounts without storing a card
    #[arg(long, requires_all = ["balance", "outward", "return_price"], conflicts_with = "add")]
    compute: bool,

    /// Remove a card
    #[arg(long, value_name = "KEY")]
    delete: Option<u64>,

    /// Label for --add (defaults to #KEY)
    #[arg(long)]
    label: Option<String>,

    /// Current card balance
    #[arg(short, long, allow_hyphen_values = true)]
    balance: Option<Money>,

    /// Price of the outward trip
    #[arg(short, long)]
    outward: Option<Money>,

    /// Price of the return trip
    #[arg(short, long = "return-price")]
    return_price: Option<Money>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let interactive = !(args.list || args.plan.is_some() || args.add || args.compute || args.delete.is_some());

    // The TUI owns the terminal, so its logs go to a file
    init_logging(if interactive { open_log_file() } else { None });

    let config = AppConfig::load().unwrap_or_default();

    if args.compute {
        let options = plan::compute(required(args.balance)?, required(args.outward)?, required(args.return_price)?);
        print!("{}", plan_table(&options));
        return Ok(());
    }

    if args.list || args.plan.is_some() || args.add || args.delete.is_some() {
        let store = CardStore::open(config.data_file.clone())?;

        if args.add {
            let draft = NewCard {
                label: args.label.unwrap_or_default().trim().to_string(),
                balance: required(args.balance)?,
                outward_price: required(args.outward)?,
                return_price: required(args.return_price)?,
            };
            let card = add_card(&store, &config, draft).await?;
            println!("{}", card.title());
            if config.notifications {
                notify("rechargecard", &format!("Added card #{} {}", card.key, card.label))?;
            }
            return Ok(());
        }

        if let Some(key) = args.delete {
            let card = delete_card(&store, &config, key).await?;
            println!("Deleted {}", card.title());
            if config.notifications {
                notify("rechargecard", &format!("Deleted card #{} {}", card.key, card.label))?;
            }
            return Ok(());
        }

        let cards = load_cards(&store, &config).await?;

        if let Some(key) = args.plan {
            let card = cards.get(key).ok_or(ValidationError::UnknownCard(key))?;
            print!("{}", plan_report(card));
            return Ok(());
        }

        println!("{}", serde_json::to_string_pretty(&list_json(&cards))?);
        return Ok(());
    }

    // Run TUI
    ui::init_theme(&config.theme);
    run_tui(config).await
}

/// clap's `requires_all` guarantees these are present
fn required(value: Option<Money>) -> Result<Money> {
    value.context("missing amount")
}

fn init_logging(log_file: Option<File>) {
    let (stderr_layer, file_layer) = match log_file {
        Some(file) => (
            None,
            Some(tracing_subscriber::fmt::layer().with_writer(Mutex::new(file)).with_ansi(false)),
        ),
        None => (Some(tracing_subscriber::fmt::layer().with_writer(io::stderr)), None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// `<data dir>/rechargecard/rechargecard.log`, or `None` to log nowhere
fn open_log_file() -> Option<File> {
    let dir = dirs::data_dir()?.join("rechargecard");
    std::fs::create_dir_all(&dir).ok()?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("rechargecard.log"))
        .ok()
}

async fn load_cards(store: &CardStore, config: &AppConfig) -> Result<CardCollection> {
    store
        .load_or_seed(config.seed_example)
        .await
        .with_context(|| format!("Could not load cards from {}", store.path().display()))
}

/// Every card with its daily cost and plan, in the stored field names
fn list_json(cards: &CardCollection) -> serde_json::Value {
    cards
        .cards()
        .iter()
        .map(|card| {
            serde_json::json!({
                "key": card.key,
                "label": card.label,
                "created": card.created,
                "balance": card.balance,
                "outwardprice": card.outward_price,
                "returnprice": card.return_price,
                "dailycost": card.daily_cost(),
                "plan": plan::plan_for(card),
            })
        })
        .collect()
}

fn plan_report(card: &Card) -> String {
    format!(
        "{}\nBalance {}  Outward {}  Return {}  Daily {}\n\n{}",
        card.title(),
        card.balance,
        card.outward_price,
        card.return_price,
        card.daily_cost(),
        plan_table(&plan::plan_for(card))
    )
}

fn plan_table(options: &[RechargeOption]) -> String {
    if options.is_empty() {
        return "No recharge options\n".to_string();
    }

    let mut table = format!("{:>6} {:>6} {:>12} {:>12}\n", "Out", "Ret", "New balance", "Recharge");
    for option in options {
        table.push_str(&format!(
            "{:>6} {:>6} {:>12} {:>12}\n",
            option.outward_tickets, option.return_tickets, option.new_balance, option.credit_recharge
        ));
    }
    table
}

async fn add_card(store: &CardStore, config: &AppConfig, draft: NewCard) -> Result<Card> {
    let mut cards = load_cards(store, config).await?;
    let card = cards.add(draft).clone();
    store.save_all(cards.cards()).await?;
    Ok(card)
}

async fn delete_card(store: &CardStore, config: &AppConfig, key: u64) -> Result<Card> {
    let mut cards = load_cards(store, config).await?;
    let card = cards.remove(key)?;
    store.save_all(cards.cards()).await?;
    Ok(card)
}

async fn run_tui(config: AppConfig) -> Result<()> {
    // Load before touching the terminal so errors print normally
    let mut app = App::new(config).await?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Main loop
    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(std::time::Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') if app.popup == Popup::None => return Ok(()),
                        KeyCode::Char('c') if key.modifiers.contains(event::KeyModifiers::CONTROL) => {
                            return Ok(())
                        }
                        _ => {
                            // Handle key and catch any errors to prevent crashes
                            if let Err(e) = app.handle_key(key).await {
                                tracing::error!("{:#}", e);
                                app.status_message = Some(format!("Error: {}", e));
                                app.status_message_time = Some(std::time::Instant::now());
                            }
                        }
                    }
                }
            }
        }

        app.tick();
    }
}

fn notify(summary: &str, body: &str) -> Result<()> {
    notify_rust::Notification::new()
        .summary(summary)
        .body(body)
        .icon("wallet")
        .show()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_add_requires_amounts() {
        assert!(Args::try_parse_from(["rechargecard", "--add", "--balance", "1"]).is_err());

        let args = Args::try_parse_from([
            "rechargecard", "--add", "--label", "bus", "-b", "-2.50", "-o", "1.45", "-r", "1.45",
        ])
        .unwrap();
        assert_eq!(args.balance, Some(Money::from_cents(-250)));
        assert_eq!(args.return_price, Some(Money::from_cents(145)));
    }

    #[test]
    fn test_list_json_shape() {
        let cards = CardCollection::new(vec![Card::example()]);
        let json = list_json(&cards);

        let entry = &json.as_array().unwrap()[0];
        assert_eq!(entry["key"], 0);
        assert_eq!(entry["label"], "Example");
        assert_eq!(entry["balance"], "0.00");
        assert_eq!(entry["outwardprice"], "6.96");
        assert_eq!(entry["returnprice"], "6.96");
        assert_eq!(entry["dailycost"], "13.92");

        let plan = entry["plan"].as_array().unwrap();
        assert_eq!(plan.len(), 15);
        assert_eq!(plan[0]["credit_recharge"], "0.00");
        assert_eq!(plan[1]["outward_tickets"], 5);
        assert_eq!(plan[1]["new_balance"], "69.60");
    }

    #[test]
    fn test_empty_plan_prints_placeholder() {
        assert_eq!(plan_table(&[]), "No recharge options\n");

        let free = NewCard::parse("free", "4.00", "0", "0").unwrap();
        let mut cards = CardCollection::default();
        let report = plan_report(cards.add(free));
        assert!(report.contains("Daily 0.00"));
        assert!(report.ends_with("\n\nNo recharge options\n"));
    }

    #[test]
    fn test_plan_table_rows() {
        let table = plan_table(&plan::compute(Money::from_cents(1392), Money::from_cents(696), Money::from_cents(696)));
        let mut lines = table.lines();

        assert_eq!(lines.next().unwrap().split_whitespace().collect::<Vec<_>>(), ["Out", "Ret", "New", "balance", "Recharge"]);
        assert_eq!(lines.next().unwrap().split_whitespace().collect::<Vec<_>>(), ["1", "1", "13.92", "0.00"]);
    }

    #[tokio::test]
    async fn test_add_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CardStore::at(dir.path().join("cards.json"));
        let config = AppConfig::default();

        let draft = NewCard::parse("", "2.50", "1.45", "1.45").unwrap();
        let added = add_card(&store, &config, draft).await.unwrap();
        assert_eq!(added.key, 1);
        assert_eq!(added.label, "#1");

        // The example card is seeded on the first run
        let stored = store.load_all().await.unwrap().unwrap();
        assert_eq!(stored.iter().map(|c| c.key).collect::<Vec<_>>(), [0, 1]);

        let deleted = delete_card(&store, &config, 0).await.unwrap();
        assert_eq!(deleted.label, "Example");
        assert_eq!(store.load_all().await.unwrap().unwrap(), vec![added]);

        let err = delete_card(&store, &config, 0).await.unwrap_err();
        assert!(err.downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn test_rejects_non_numeric_amount() {
        let err = Args::try_parse_from(["rechargecard", "--compute", "-b", "ten", "-o", "1", "-r", "1"]).unwrap_err();
        assert!(err.to_string().contains("not a valid amount"));
    }
}
