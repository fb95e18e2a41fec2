use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mockline_intercept::config::Config;
use mockline_intercept::persistence::{
    delete_mock_rule, export_mock_rules, import_mock_rules, save_mock_rule, toggle_mock_enabled,
    ImportMode, MemoryStore,
};
use mockline_intercept::relay::{self, serve_relay, TransportKind};
use mockline_intercept::store::RuleStore;
use mockline_intercept::transport::{
    Fetch, FetchRequest, MockEngine, MockFetch, MockXhr, NetworkFetch, NetworkXhr, XhrEvent,
    XhrTransport, XmlHttpRequest,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// Mockline - answer fetch and XHR calls from a mock rule file
#[derive(Parser, Debug)]
#[command(name = "mockline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Rule file: a list of rules, or an object with mockRules and isEnabled
    #[arg(short, long, env = "MOCKLINE_RULES")]
    rules: PathBuf,

    /// YAML configuration file
    #[arg(short, long, env = "MOCKLINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Request(RequestCommand),
    /// Edit the rule file in place
    Rules {
        #[command(subcommand)]
        action: RulesAction,
    },
}

#[derive(Subcommand, Debug)]
enum RulesAction {
    /// Print the stored rules as a JSON list
    Export,
    /// Add a rule, or replace the rule with the same id
    Save {
        /// The rule as a JSON object
        rule: String,
    },
    /// Remove the rule with this id
    Delete { id: String },
    /// Turn mocking on or off for every rule
    Toggle {
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
    /// Import a JSON list of rules, merging by id
    Import {
        file: PathBuf,
        /// Discard the stored rules instead of merging
        #[arg(long)]
        replace: bool,
    },
}

#[derive(Subcommand, Debug)]
enum RequestCommand {
    /// Show which rule, if any, answers a request
    Match {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
    },
    /// Perform a fetch; unmatched requests go to the network
    Fetch {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Perform an XHR and print every lifecycle notification
    Xhr {
        url: String,
        #[arg(short = 'X', long, default_value = "GET")]
        method: String,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => Config::default(),
    };

    let persisted = Arc::new(MemoryStore::from_rule_file(&args.rules)?);
    let command = match args.command {
        Command::Rules { action } => return edit_rules(&persisted, &args.rules, action),
        Command::Request(command) => command,
    };

    let (page_relay, extension_side) = relay::channel(64);
    tokio::spawn(serve_relay(persisted, extension_side));

    let notifier = page_relay.notifier();
    let store = RuleStore::new(
        Arc::new(page_relay),
        config.relay.clone(),
        config.refresh.clone(),
    );
    let state = store.refresh().await;
    info!("Loaded {} rule(s) from {}", state.len(), args.rules.display());

    let engine = MockEngine::new(store).with_notifier(notifier);

    match command {
        RequestCommand::Match { url, method } => {
            let method = method.to_ascii_uppercase();
            match engine.lookup(&url, &method, TransportKind::Fetch) {
                Some(rule) => println!("{}", serde_json::to_string_pretty(rule.as_ref())?),
                None => println!("no rule matches {method} {url}"),
            }
        }
        RequestCommand::Fetch { url, method, data } => {
            let fetch = MockFetch::new(engine, NetworkFetch::default());
            let mut request = FetchRequest::new(method, url);
            request.body = data;

            let response = fetch.fetch(request).await?;
            println!("{}", response.status());
            for (name, value) in response.headers() {
                println!("{}: {}", name, String::from_utf8_lossy(value.as_bytes()));
            }
            println!();
            println!("{}", response.text().await?);
        }
        RequestCommand::Xhr { url, method, data } => {
            let transport = MockXhr::new(engine, NetworkXhr::default(), &config.xhr);
            let xhr = XmlHttpRequest::new();

            for event in [
                XhrEvent::ReadyStateChange,
                XhrEvent::Load,
                XhrEvent::Error,
            ] {
                xhr.add_event_listener(event, move |xhr| {
                    println!(
                        "{:<16} readyState={} status={}",
                        event.name(),
                        xhr.ready_state().as_u8(),
                        xhr.status()
                    )
                });
            }
            let (done_tx, done_rx) = oneshot::channel();
            let done_tx = parking_lot::Mutex::new(Some(done_tx));
            xhr.add_event_listener(XhrEvent::LoadEnd, move |_| {
                if let Some(tx) = done_tx.lock().take() {
                    let _ = tx.send(());
                }
            });

            transport.open(&xhr, &method, &url);
            transport.send(&xhr, data);
            done_rx
                .await
                .context("XHR was dropped before it completed")?;

            println!();
            println!("{} {}", xhr.status(), xhr.status_text());
            println!("{}", xhr.get_all_response_headers());
            println!();
            println!("{}", xhr.response_text());
        }
    }

    Ok(())
}

fn edit_rules(store: &MemoryStore, path: &Path, action: RulesAction) -> Result<()> {
    match action {
        RulesAction::Export => {
            println!("{}", serde_json::to_string_pretty(&export_mock_rules(store)?)?);
            return Ok(());
        }
        RulesAction::Save { rule } => {
            let rule: Value = serde_json::from_str(&rule).context("Rule is not valid JSON")?;
            save_mock_rule(store, rule)?;
        }
        RulesAction::Delete { id } => {
            if !delete_mock_rule(store, &id)? {
                warn!("No rule with id {} in {}", id, path.display());
            }
        }
        RulesAction::Toggle { enabled } => toggle_mock_enabled(store, enabled)?,
        RulesAction::Import { file, replace } => {
            let contents = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let rules: Vec<Value> = serde_json::from_str(&contents)
                .with_context(|| format!("{} must hold a JSON list of rules", file.display()))?;
            let mode = if replace {
                ImportMode::Replace
            } else {
                ImportMode::Merge
            };
            import_mock_rules(store, rules, mode)?;
        }
    }

    store.write_rule_file(path)?;
    info!("Updated {}", path.display());
    Ok(())
}
