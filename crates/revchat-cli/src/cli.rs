use clap::{Parser, Subcommand};

/// revchat: talk to ChatGPT through its web session.
#[derive(Parser, Debug)]
#[command(name = "revchat", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long)]
    pub config: Option<String>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Proxy override, e.g. socks5://127.0.0.1:1080.
    #[arg(long)]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ask a question and stream the answer to stdout.
    Ask {
        prompt: String,

        /// Continue this conversation.
        #[arg(short, long)]
        conversation: Option<String>,

        /// Reply to this message instead of the latest one.
        #[arg(short, long)]
        parent: Option<String>,

        /// Model override.
        #[arg(short, long)]
        model: Option<String>,

        /// Turn deadline in seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Log in and store the resulting tokens.
    Login,

    /// List conversations.
    List {
        #[arg(long, default_value_t = 0)]
        offset: u32,

        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Hide one conversation.
    Delete { conversation: String },

    /// Hide every conversation.
    Clear,
}

pub fn parse() -> Args {
    Args::parse()
}
