//! feed-runner: headless driver for the deal feed curation engine.
//!
//! Usage:
//!   feed-runner --deals deals.json --user u1 --date 2026-10-16 --db state.db
//!   feed-runner --deals deals.json --lat 36.11 --lon -115.17 --ipc-mode
//!
//! Batch mode prints the curated order. IPC mode reads one JSON command per
//! line on stdin and answers each with the deck state as one JSON line.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use dealfeed_core::{
    clock::ManualClock,
    config::CurationConfig,
    deal::Deal,
    deck::{Deck, DeckCounts, TransitionState},
    engine::{CurationEngine, FeedContext},
    event::FeedEvent,
    feed::{CuratedFeed, Placement},
    filter::FilterState,
    geo::Coordinates,
    saved::SavedDeals,
    store::{anonymous_user_id, PersistedSet, SqliteStorage, DISMISSED_KEY, SAVED_KEY},
};
use std::env;
use std::io::{self, BufRead, Write};
use std::rc::Rc;
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    GetState,
    Dismiss { deal_id: String },
    DismissImmediate { deal_id: String },
    /// Advance the runner's clock, then fire whatever is due.
    Tick {
        #[serde(default)]
        ms: u64,
    },
    Filter { state: FilterState },
    ToggleSave { deal_id: String },
    Quit,
}

#[derive(serde::Serialize)]
struct CardView {
    id:             String,
    name:           String,
    category:       String,
    brand:          Option<String>,
    dispensary:     String,
    sale_price:     f64,
    deal_score:     f64,
    distance_miles: Option<f64>,
    saved:          bool,
}

#[derive(serde::Serialize)]
struct UiState {
    user_id:    String,
    date:       String,
    visible:    Vec<CardView>,
    remaining:  usize,
    counts:     DeckCounts,
    complete:   bool,
    transition: TransitionState,
    events:     Vec<FeedEvent>,
}

struct Session {
    engine:  CurationEngine,
    deals:   Vec<Arc<Deal>>,
    ctx:     FeedContext,
    filter:  FilterState,
    feed:    CuratedFeed,
    deck:    Deck,
    saved:   SavedDeals,
    clock:   ManualClock,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let deals_path = str_arg(&args, "--deals").unwrap_or("./deals.json");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let date = match str_arg(&args, "--date") {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("--date expects YYYY-MM-DD, got '{raw}'"))?,
        None => Local::now().date_naive(),
    };
    let location = match (parse_arg::<f64>(&args, "--lat"), parse_arg::<f64>(&args, "--lon")) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        _ => None,
    };

    let storage = Rc::new(if db == ":memory:" {
        SqliteStorage::in_memory()?
    } else {
        SqliteStorage::open(db)?
    });
    storage.migrate()?;

    let user_id = match str_arg(&args, "--user") {
        Some(u) => u.to_string(),
        None => anonymous_user_id(storage.as_ref()),
    };

    let config = match CurationConfig::load(data_dir) {
        Ok(c) => c,
        Err(e) => {
            log::warn!("config: {e:#}; using defaults");
            CurationConfig::default()
        }
    };

    let deals = load_deals(deals_path)?;

    if !ipc_mode {
        println!("dealfeed: feed-runner");
        println!("  deals:     {deals_path} ({} loaded)", deals.len());
        println!("  user:      {user_id}");
        println!("  date:      {date}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let clock = ManualClock::at(date.and_time(Utc::now().time()).and_utc());
    let mut ctx = FeedContext::new(date, user_id);
    ctx.location = location;

    let engine = CurationEngine::new(config);
    let filter = FilterState::default();
    let feed = engine.build_feed(&deals, &filter, &ctx);

    let mut deck = Deck::new(
        engine.config().deck.clone(),
        Box::new(clock.clone()),
        PersistedSet::new(Box::new(Rc::clone(&storage)), DISMISSED_KEY),
    );
    deck.rebuild(feed.deals());
    let saved = SavedDeals::new(
        Box::new(clock.clone()),
        PersistedSet::new(Box::new(Rc::clone(&storage)), SAVED_KEY),
    );

    let mut session = Session { engine, deals, ctx, filter, feed, deck, saved, clock };

    if ipc_mode {
        run_ipc_loop(&mut session)?;
    } else {
        print_feed(&session);
    }
    session.deck.unmount();
    Ok(())
}

fn load_deals(path: &str) -> Result<Vec<Arc<Deal>>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Cannot read {path}"))?;
    let deals: Vec<Deal> = serde_json::from_str(&content).with_context(|| format!("Cannot parse {path}"))?;
    Ok(deals.into_iter().map(Arc::new).collect())
}

fn run_ipc_loop(session: &mut Session) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }
        if buffer.trim().is_empty() {
            continue;
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let events = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::GetState => Vec::new(),
            IpcCommand::Dismiss { deal_id } => session.deck.dismiss(&deal_id),
            IpcCommand::DismissImmediate { deal_id } => session.deck.dismiss_immediate(&deal_id),
            IpcCommand::Tick { ms } => {
                session.clock.advance(ms);
                session.deck.tick()
            }
            IpcCommand::Filter { state } => {
                session.filter = state;
                session.feed = session.engine.build_feed(&session.deals, &session.filter, &session.ctx);
                session.deck.rebuild(session.feed.deals())
            }
            IpcCommand::ToggleSave { deal_id } => {
                if let Err(e) = session.saved.toggle(&deal_id) {
                    log::warn!("saved: toggle of {deal_id} failed: {e}");
                }
                Vec::new()
            }
        };

        let state = build_ui_state(session, events);
        writeln!(stdout, "{}", serde_json::to_string(&state)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn build_ui_state(session: &mut Session, events: Vec<FeedEvent>) -> UiState {
    let view = session.deck.view();
    let visible = view
        .visible
        .iter()
        .map(|d| CardView {
            id:             d.id.clone(),
            name:           d.name.clone(),
            category:       d.category.to_string(),
            brand:          d.brand.clone(),
            dispensary:     d.dispensary.id.clone(),
            sale_price:     d.sale_price,
            deal_score:     d.deal_score,
            distance_miles: session.feed.distance_of(&d.id),
            saved:          session.saved.contains(&d.id),
        })
        .collect();

    UiState {
        user_id:    session.ctx.user_id.clone(),
        date:       session.ctx.date.format("%Y-%m-%d").to_string(),
        visible,
        remaining:  view.remaining.len(),
        counts:     view.counts,
        complete:   view.is_complete,
        transition: view.transition,
        events,
    }
}

fn print_feed(session: &Session) {
    let feed = &session.feed;
    println!("=== CURATED FEED ===");
    println!("  entries:    {}", feed.len());
    println!("  heroes:     {}", feed.hero_count);
    println!("  rebalance:  {} passes", feed.rebalance_passes);
    println!();

    for (i, entry) in feed.entries.iter().enumerate() {
        let d = &entry.deal;
        let how = match &entry.placement {
            Placement::Hero { label } => format!("hero:{label}"),
            Placement::Interleaved { tier } => format!("{tier:?}"),
            Placement::Relaxed { tier } => format!("{tier:?} (relaxed)"),
            Placement::Rebalanced { tier } => format!("{tier:?} (rebalanced)"),
            Placement::Sorted => "sorted".to_string(),
        };
        let distance = feed
            .distance_of(&d.id)
            .map(|m| format!("{m:.1} mi"))
            .unwrap_or_default();
        println!(
            "  {:>3}. {:<24} {:<12} {:<20} ${:>7.2}  {:>5.1}  {:<22} {}",
            i + 1,
            d.id,
            d.category.name(),
            d.dispensary.id,
            d.sale_price,
            d.deal_score,
            how,
            distance
        );
    }

    println!();
    println!("=== VISIBLE WINDOW ===");
    let view = session.deck.view();
    for (i, d) in view.visible.iter().enumerate() {
        println!("  [{i}] {}", d.id);
    }
    println!(
        "  {} visible, {} remaining, {} dismissed today",
        view.visible.len(),
        view.remaining.len(),
        view.counts.dismissed
    );
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str) -> Option<T> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
}
