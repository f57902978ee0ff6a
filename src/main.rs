//! AskSQL - ask a database questions in plain English.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use asksql::cli::Cli;
use asksql::config::{Config, ConnectionProfile};
use asksql::db::{SchemaSnapshot, SqlxConnector};
use asksql::error::{AskSqlError, Result};
use asksql::llm::{create_client, LlmProvider, OPENAI_API_KEY_VAR};
use asksql::logging;
use asksql::output;
use asksql::persistence::StoreKind;
use asksql::query::ExecutionResult;
use asksql::session::{Pipeline, Session};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    if cli.log_file {
        logging::init_file_logging();
    } else {
        logging::init_stderr_logging();
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e.message());
        eprintln!("{}: {}", e.category(), e.message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    if cli.clear {
        let store = cli.store_kind();
        store.open().clear()?;
        println!("Cleared {store} credentials.");
        return Ok(());
    }

    let mut profile = resolve_profile(&cli, &config)?;

    if cli.save {
        let store = cli.store_kind();
        match store.open().save(&profile) {
            Ok(()) => println!("Saved connection to {store} credentials."),
            Err(e) => eprintln!("{}: {}", e.category(), e.message()),
        }
    }

    let provider = match cli.llm {
        Some(provider) => provider,
        None => config.llm.provider.parse::<LlmProvider>()?,
    };
    let llm = create_client(provider, std::env::var(OPENAI_API_KEY_VAR).ok(), &config.llm)?;

    profile.apply_env_defaults();
    let connection = profile.validate()?;
    info!("Connection: {}", connection.display_string());

    let pipeline = Pipeline::new(
        Arc::new(SqlxConnector),
        Arc::from(llm),
        Duration::from_secs(config.schema.cache_ttl_secs),
    )
    .with_notes(config.prompt.notes.clone())
    .with_narrowing(config.schema.narrow_to_question);
    let mut session = Session::new(connection);

    if cli.show_schema {
        match pipeline.schema(&session).await {
            SchemaSnapshot::Ready(schema) => print!("{}", output::render_schema(&schema)),
            SchemaSnapshot::Unavailable(e) => eprintln!("Schema unavailable: {e}"),
        }
    }

    match &cli.question {
        Some(question) => answer(&pipeline, &mut session, question, &cli).await,
        None if cli.show_schema => {}
        None => interactive(&pipeline, &mut session, &cli).await?,
    }

    Ok(())
}

/// Picks the connection source, then lets command-line flags override it.
///
/// Sources, first match wins: named connection, the `--store` credential
/// store, saved personal credentials, the `default` connection in the
/// config file.
fn resolve_profile(cli: &Cli, config: &Config) -> Result<ConnectionProfile> {
    let mut profile = if let Some(name) = cli.connection_name() {
        config.get_connection(Some(name)).cloned().ok_or_else(|| {
            AskSqlError::config(format!("Connection '{name}' not found in config file"))
        })?
    } else if let Some(store) = cli.store {
        store.open().load().unwrap_or_else(|| {
            warn!("No saved {store} credentials");
            ConnectionProfile::default()
        })
    } else if let Some(saved) = StoreKind::Personal.open().load() {
        info!("Using saved personal credentials");
        saved
    } else {
        config.get_connection(None).cloned().unwrap_or_default()
    };

    profile.merge(&cli.to_profile()?);
    Ok(profile)
}

async fn interactive(pipeline: &Pipeline, session: &mut Session, cli: &Cli) -> Result<()> {
    let prompt = std::io::stdin().is_terminal();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if prompt {
            eprint!("asksql> ");
        }
        let line = lines
            .next_line()
            .await
            .map_err(|e| AskSqlError::config(format!("Failed to read stdin: {e}")))?;
        let Some(line) = line else { break };

        let question = line.trim();
        match question {
            "" => continue,
            "exit" | "quit" => break,
            "refresh" => {
                pipeline.refresh_schema(session);
                eprintln!("Schema cache cleared.");
            }
            _ => answer(pipeline, session, question, cli).await,
        }
    }

    Ok(())
}

async fn answer(pipeline: &Pipeline, session: &mut Session, question: &str, cli: &Cli) {
    if cli.sql_only {
        let query = pipeline.generate(session, question).await;
        println!("{}", query.sql);
        return;
    }

    let outcome = pipeline.ask(session, question).await;
    println!("{}\n", outcome.query.sql);

    match &outcome.execution {
        ExecutionResult::Success(result) => {
            print!("{}", output::render_table(result));
            if let Some(path) = &cli.csv {
                match output::write_csv(result, path) {
                    Ok(()) => eprintln!("Wrote {}", path.display()),
                    Err(e) => eprintln!("{}: {}", e.category(), e.message()),
                }
            }
        }
        ExecutionResult::Blocked { reason, .. } => {
            eprintln!("Blocked: {reason}");
        }
        ExecutionResult::Failed(e) => {
            eprintln!("Execution failed: {}", e.message());
        }
    }
}
