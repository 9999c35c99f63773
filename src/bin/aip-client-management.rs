//! AIP OAuth Client Management CLI Tool
//!
//! A command-line interface for managing a dynamically registered OAuth 2.0 / OpenID Connect
//! client through its client configuration endpoint (RFC 7592).
//!
//! ## Usage Examples
//!
//! ### Read the current client configuration
//! ```bash
//! aip-client-management \
//!   --registration-uri "https://auth.example.com/oauth/clients/client_id_here" \
//!   --registration-token "registration_access_token_here" \
//!   get
//! ```
//!
//! ### Update a client
//! ```bash
//! aip-client-management \
//!   --registration-uri "https://auth.example.com/oauth/clients/client_id_here" \
//!   --registration-token "registration_access_token_here" \
//!   update \
//!   --name "Updated Client Name" \
//!   --redirect-uri "http://localhost:3000/new-callback" \
//!   --metadata '{"logo_uri": "https://example.com/logo.png"}'
//! ```
//!
//! The current configuration is read first; only the given fields are changed and the
//! rest of the registration is sent back unchanged.
//!
//! ### Delete a client
//! ```bash
//! aip-client-management \
//!   --registration-uri "https://auth.example.com/oauth/clients/client_id_here" \
//!   --registration-token "registration_access_token_here" \
//!   delete --yes
//! ```
//!
//! ## Environment Variables
//!
//! - `AIP_REGISTRATION_URI`: client configuration endpoint (alternative to --registration-uri)
//! - `AIP_REGISTRATION_TOKEN`: registration access token (alternative to --registration-token)
//! - `CONNECTION_RETRY_COUNT`, `CONNECTION_RETRY_DELAY`, `HTTP_CLIENT_TIMEOUT`,
//!   `CERTIFICATE_BUNDLES`, `USER_AGENT`: HTTP client settings
//! - `RUST_LOG`: log filter
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error (network, configuration, parsing, etc.)
//! - 2: Client management error
//! - 3: Authentication error

use aip_client_registration::{
    config::Config,
    errors::RegistrationError,
    http::{ManagementContext, ReqwestTransport, RetryPolicy},
    registration::{ClientMetadata, RegisteredClient},
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::process;
use std::sync::Arc;
use tracing_subscriber::prelude::*;

/// OAuth Grant Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// Authorization Code Grant (RFC 6749 Section 4.1)
    AuthorizationCode,
    /// Client Credentials Grant (RFC 6749 Section 4.4)
    ClientCredentials,
    /// Refresh Token Grant (RFC 6749 Section 6)
    RefreshToken,
}

/// OAuth Response Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    /// Authorization Code Response Type
    Code,
}

/// Client Authentication Methods
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuthMethod {
    /// HTTP Basic Authentication with client credentials
    ClientSecretBasic,
    /// Client credentials in POST body
    ClientSecretPost,
    /// No client authentication (public clients)
    None,
    /// Private Key JWT authentication
    PrivateKeyJwt,
}

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "aip-client-management",
    about = "AIP OAuth Client Management CLI Tool",
    long_about = "Manage a dynamically registered OAuth 2.0 client through its client \
                  configuration endpoint (RFC 7592).",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Client configuration endpoint returned at registration
    #[arg(long, env = "AIP_REGISTRATION_URI")]
    registration_uri: String,

    /// Registration access token returned at registration
    #[arg(long, env = "AIP_REGISTRATION_TOKEN", hide_env_values = true)]
    registration_token: Option<String>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output for debugging")]
    verbose: bool,

    /// Output format
    #[arg(
        long,
        value_enum,
        default_value = "json",
        help = "Output format for responses"
    )]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Output format options
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// JSON formatted output
    Json,
    /// Pretty-printed JSON output
    JsonPretty,
    /// Human-readable table format
    Table,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Read the current client configuration
    Get,
    /// Update the client configuration
    Update(UpdateArgs),
    /// Delete the client registration
    Delete(DeleteArgs),
}

/// Arguments for client updates
#[derive(Args)]
struct UpdateArgs {
    /// Human-readable name for the client
    #[arg(long, help = "Human-readable name for the OAuth client")]
    name: Option<String>,

    /// OAuth redirect URIs (can be specified multiple times)
    #[arg(
        long = "redirect-uri",
        help = "OAuth redirect URI (can be specified multiple times; replaces all existing URIs)"
    )]
    redirect_uris: Vec<String>,

    /// OAuth grant types (can be specified multiple times)
    #[arg(
        long = "grant-type",
        value_enum,
        help = "OAuth grant type (can be specified multiple times; replaces all existing grant types)"
    )]
    grant_types: Vec<GrantType>,

    /// OAuth response types (can be specified multiple times)
    #[arg(
        long = "response-type",
        value_enum,
        help = "OAuth response type (can be specified multiple times; replaces all existing response types)"
    )]
    response_types: Vec<ResponseType>,

    /// OAuth scopes (space-separated)
    #[arg(long, help = "OAuth scopes as a space-separated string")]
    scope: Option<String>,

    /// Client authentication method
    #[arg(
        long = "auth-method",
        value_enum,
        help = "Client authentication method"
    )]
    auth_method: Option<ClientAuthMethod>,

    /// Additional metadata as JSON
    #[arg(
        long,
        help = "Additional client metadata as JSON string (e.g., '{\"custom_field\": \"value\"}')"
    )]
    metadata: Option<String>,
}

/// Arguments for client deletion
#[derive(Args)]
struct DeleteArgs {
    /// Skip confirmation prompt
    #[arg(long, help = "Skip the confirmation prompt")]
    yes: bool,
}

/// Application errors
#[derive(Debug)]
enum AppError {
    /// Registered client management errors
    Registration(RegistrationError),
    /// JSON parsing or serialization errors
    Json(serde_json::Error),
    /// General application errors
    General(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::Registration(RegistrationError::InvalidRegistrationToken) => 3,
            AppError::Registration(RegistrationError::ServerUnavailable) => 1,
            AppError::Registration(_) => 2,
            AppError::Json(_) | AppError::General(_) => 1,
        }
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        AppError::Registration(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Registration(err) => write!(f, "Client management error: {}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

/// Main application entry point
#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "aip_client_registration=debug,info"
    } else {
        "aip_client_registration=info,warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(&cli).await {
        eprintln!("Error: {}", err);
        process::exit(err.exit_code());
    }
}

async fn run(cli: &Cli) -> Result<(), AppError> {
    let config = Config::new().map_err(|e| AppError::General(e.to_string()))?;
    let transport =
        ReqwestTransport::from_config(&config).map_err(|e| AppError::General(e.to_string()))?;
    let context = ManagementContext::new(Arc::new(transport), RetryPolicy::from(&config));

    let client = RegisteredClient::new(
        Arc::new(context),
        ClientMetadata::default(),
        Some(cli.registration_uri.clone()),
        cli.registration_token.clone(),
    );

    let result = match &cli.command {
        Commands::Get => get_client(cli, &client).await,
        Commands::Update(args) => update_client(cli, &client, args).await,
        Commands::Delete(args) => delete_client(cli, &client, args).await,
    };

    client.close();
    result
}

/// Read the current client configuration
async fn get_client(cli: &Cli, client: &RegisteredClient) -> Result<(), AppError> {
    tracing::info!(uri = %cli.registration_uri, "reading client configuration");

    let current = client.read().await?;
    output_response(&cli.format, &client_view(&current)?)
}

/// Update the client configuration
async fn update_client(
    cli: &Cli,
    client: &RegisteredClient,
    args: &UpdateArgs,
) -> Result<(), AppError> {
    let new_metadata = build_update(args)?;
    tracing::info!(
        uri = %cli.registration_uri,
        changes = %new_metadata,
        "updating client configuration"
    );

    let current = client.read().await?;
    let updated = current.update(&new_metadata).await?;
    output_response(&cli.format, &client_view(&updated)?)
}

/// Delete the client registration
async fn delete_client(
    cli: &Cli,
    client: &RegisteredClient,
    args: &DeleteArgs,
) -> Result<(), AppError> {
    if !args.yes {
        println!(
            "Are you sure you want to delete the client registered at '{}'? (y/N)",
            cli.registration_uri
        );
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .map_err(|e| AppError::General(format!("Failed to read confirmation: {}", e)))?;

        let input = input.trim().to_lowercase();
        if input != "y" && input != "yes" {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    tracing::info!(uri = %cli.registration_uri, "deleting client registration");
    client.delete().await?;
    println!("Client registered at '{}' deleted.", cli.registration_uri);
    Ok(())
}

/// Build the partial metadata sent to [`RegisteredClient::update`]
fn build_update(args: &UpdateArgs) -> Result<ClientMetadata, AppError> {
    let mut builder = ClientMetadata::builder();

    if let Some(metadata_str) = &args.metadata {
        let metadata = ClientMetadata::from_json_str(metadata_str)
            .map_err(|e| AppError::General(format!("Invalid metadata JSON: {}", e)))?;
        builder = builder.extend(metadata.into_json_object());
    }
    if let Some(name) = &args.name {
        builder = builder.client_name(name.clone());
    }
    if !args.redirect_uris.is_empty() {
        builder = builder.redirect_uris(args.redirect_uris.iter().cloned());
    }
    if !args.grant_types.is_empty() {
        builder = builder.property("grant_types", serde_json::to_value(&args.grant_types)?);
    }
    if !args.response_types.is_empty() {
        builder = builder.property(
            "response_types",
            serde_json::to_value(&args.response_types)?,
        );
    }
    if let Some(scope) = &args.scope {
        builder = builder.scope(scope.clone());
    }
    if let Some(auth_method) = &args.auth_method {
        builder = builder.property(
            "token_endpoint_auth_method",
            serde_json::to_value(auth_method)?,
        );
    }

    Ok(builder.build())
}

/// Metadata plus the (possibly rotated) registration endpoint and token
fn client_view(client: &RegisteredClient) -> Result<Value, AppError> {
    let mut view: Map<String, Value> = client.metadata()?.into_json_object();
    if let Some(uri) = client.registration_uri() {
        view.insert("registration_client_uri".to_string(), Value::from(uri));
    }
    if let Some(token) = client.registration_token() {
        view.insert("registration_access_token".to_string(), Value::from(token));
    }
    Ok(Value::Object(view))
}

/// Output response data in the requested format
fn output_response<T: Serialize>(format: &OutputFormat, data: &T) -> Result<(), AppError> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(data)?);
        }
        OutputFormat::JsonPretty => {
            println!("{}", serde_json::to_string_pretty(data)?);
        }
        OutputFormat::Table => {
            let json_value: Value = serde_json::to_value(data)?;
            print_table(&json_value, 0);
        }
    }
    Ok(())
}

/// Print data in table format (recursive for nested objects)
fn print_table(value: &Value, indent: usize) {
    let prefix = "  ".repeat(indent);

    match value {
        Value::Object(map) => {
            for (key, val) in map {
                match val {
                    Value::Object(_) => {
                        println!("{}{}:", prefix, key);
                        print_table(val, indent + 1);
                    }
                    Value::Array(arr) => {
                        println!("{}{}:", prefix, key);
                        for (i, item) in arr.iter().enumerate() {
                            println!("{}  [{}]:", prefix, i);
                            print_table(item, indent + 2);
                        }
                    }
                    _ => {
                        println!("{}{}: {}", prefix, key, format_value(val));
                    }
                }
            }
        }
        _ => {
            println!("{}{}", prefix, format_value(value));
        }
    }
}

/// Format a JSON value for display
fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_else(|_| "invalid".to_string()),
    }
}
