use clap::Parser;
use linegpt_core::config::{DEFAULT_SYSTEM_PROMPT, ENV_API_KEY};
use linegpt_core::{
    CompletionClient, CompletionSettings, Message, DEFAULT_COMPLETION_ENDPOINT, DEFAULT_MODEL,
};
use tracing_subscriber::EnvFilter;

/// Send a single question to the completion endpoint and print the answer
#[derive(Parser, Debug)]
#[command(name = "linegpt-ask")]
struct Args {
    /// Question to ask
    question: String,

    /// Completion API key
    #[arg(short = 'k', long, env = ENV_API_KEY, hide_env_values = true)]
    api_key: String,

    /// System prompt to use
    #[arg(short, long, default_value = DEFAULT_SYSTEM_PROMPT)]
    system_prompt: String,

    /// Completion model to use
    #[arg(short = 'o', long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Completion endpoint URL
    #[arg(long, default_value = DEFAULT_COMPLETION_ENDPOINT)]
    endpoint: String,

    /// Print the full response including token usage
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let client = CompletionClient::new(CompletionSettings {
        endpoint: args.endpoint,
        model: args.model,
    });
    let messages = [
        Message::system(args.system_prompt),
        Message::user(args.question),
    ];

    let request = client.build_request(&messages);
    let response = client.create_completion(&args.api_key, &request).await?;

    if args.verbose {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    let reply = CompletionClient::extract_reply(response)?;
    println!("{}", reply.content);
    Ok(())
}
