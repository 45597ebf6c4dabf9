mod cli;
mod setup;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use revchat_client::{AskRequest, ChatClient};
use revchat_common::RevchatError;
use revchat_config::{RevchatConfig, TokenStore};
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

fn load_config(args: &Args) -> Result<RevchatConfig, RevchatError> {
    let mut config = match args.config.as_deref() {
        Some(path) => revchat_config::load_config_from(Path::new(path))?,
        None => revchat_config::load_config()?,
    };
    if let Some(proxy) = &args.proxy {
        config.network.proxy = proxy.clone();
    }
    Ok(config)
}

fn init_logging(args: &Args, config: &RevchatConfig) {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(config.logging.level.as_str());
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(
                setup::log_directive(level)
                    .parse()
                    .unwrap_or_else(|_| "revchat=info".parse().unwrap()),
            ),
        )
        .init();
}

fn chat_err(e: revchat_client::ChatError) -> RevchatError {
    RevchatError::Chat(e.to_string())
}

async fn ask(
    client: &ChatClient,
    prompt: String,
    conversation: Option<String>,
    parent: Option<String>,
    model: Option<String>,
    timeout: Option<u64>,
) -> Result<(), RevchatError> {
    let mut request = AskRequest::new(prompt)
        .in_conversation(conversation.unwrap_or_default())
        .with_parent(parent.unwrap_or_default())
        .with_model(model.unwrap_or_default());
    if let Some(secs) = timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let mut ids = (String::new(), String::new());
    client
        .ask(request, |chunk| {
            // Errors are reported once by the caller.
            let Ok(answer) = chunk else { return };
            if let Some(error) = &answer.error {
                eprintln!("server error: {error}");
            }
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(answer.delta.as_bytes());
            let _ = stdout.flush();
            if answer.done {
                let _ = writeln!(stdout);
                ids = (answer.conversation_id.clone(), answer.message_id.clone());
            }
        })
        .await
        .map_err(chat_err)?;

    if !ids.0.is_empty() {
        eprintln!("conversation: {}  message: {}", ids.0, ids.1);
    }
    Ok(())
}

async fn run(args: Args, config: RevchatConfig) -> Result<(), RevchatError> {
    let store = TokenStore::default_location()?;
    let stored = match store.load() {
        Ok(tokens) => tokens,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable token store");
            None
        }
    };

    let client_config = setup::client_config(&config, stored.as_ref());
    tracing::debug!(config = ?client_config, "client configured");
    let client = ChatClient::new(client_config).map_err(chat_err)?;

    let result = match args.command {
        Command::Ask {
            prompt,
            conversation,
            parent,
            model,
            timeout,
        } => ask(&client, prompt, conversation, parent, model, timeout).await,
        Command::Login => client.login().await.map(|_| ()).map_err(chat_err),
        Command::List { offset, limit } => {
            client
                .list_conversations(offset, limit)
                .await
                .map(|page| {
                    for item in &page.items {
                        println!("{}  {}", item.id, item.title);
                    }
                    eprintln!(
                        "{} of {} (offset {})",
                        page.items.len(),
                        page.total,
                        page.offset
                    );
                })
                .map_err(chat_err)
        }
        Command::Delete { conversation } => client
            .delete_conversation(&conversation)
            .await
            .map_err(chat_err),
        Command::Clear => client.clear_conversations().await.map_err(chat_err),
    };

    client.wait_background().await;

    if let Some(tokens) = setup::tokens_to_save(client.tokens(), stored.as_ref()) {
        match store.save(&tokens) {
            Ok(()) => tracing::info!("tokens saved to {}", store.path().display()),
            Err(e) => tracing::warn!(error = %e, "failed to save tokens"),
        }
    }

    result
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("revchat: {e}");
            std::process::exit(2);
        }
    };
    init_logging(&args, &config);
    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "revchat starting");

    if let Err(e) = run(args, config).await {
        eprintln!("revchat: {e}");
        std::process::exit(1);
    }
}
