use std::error::Error;

use clap::Parser;
use tracing::Level;
use up42_auth::client::{ClientFactory, ClientOptions};
use up42_auth::commands::request::{RequestCommand, RequestInput};
use up42_auth::commands::retrieve_token::RetrieveTokenCommand;
use up42_auth::http::client::HttpClient;
use up42_auth::parameters::{Commands, OutPutTokenFormat};
use up42_auth::settings::Environment;

#[derive(Parser, Debug)]
#[command(name = "up42-auth-cli")]
struct Cli {
    /// Log requests and token refreshes
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Builds the reqwest client with the timeout of the factory's token settings.
fn http_client(factory: &ClientFactory) -> Result<HttpClient, String> {
    HttpClient::new(factory.token_settings().timeout)
        .map_err(|e| format!("error creating http client: {}", e))
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.debug { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::RetrieveToken {
            credentials,
            environment,
            output_token_format,
        } => {
            let factory = ClientFactory::new(Environment::try_from(environment)?);
            let http_client = http_client(&factory)?;
            let token = RetrieveTokenCommand::new(factory, http_client)
                .retrieve_token(ClientOptions::from(credentials))?;
            match output_token_format {
                OutPutTokenFormat::Plain => {
                    println!("{}", token.access_token());
                }
                OutPutTokenFormat::Json => {
                    let output = serde_json::to_string_pretty(&token)?;
                    println!("{}", output);
                }
            }
            Ok(())
        }
        Commands::Request {
            credentials,
            environment,
            method,
            path,
            body,
            allow_error_status,
        } => {
            let factory = ClientFactory::new(Environment::try_from(environment)?);
            let http_client = http_client(&factory)?;
            let input = RequestInput {
                method,
                path,
                body,
                allow_error_status,
            };
            let response = RequestCommand::new(factory, http_client)
                .request(ClientOptions::from(credentials), &input)?;
            if !response.status().is_success() {
                eprintln!("{}", response.status());
            }
            println!("{}", String::from_utf8_lossy(response.body()));
            Ok(())
        }
    }
}
