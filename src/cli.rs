//! Command-line front end over the API client.

use std::path::Path;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use thiserror::Error;

use forensic_client::api::{ApiRequest, ApiResponse};
use forensic_client::config::{parse_base_url, ConfigError};
use forensic_client::session::LoginRequest;
use forensic_client::storage::StorageError;
use forensic_client::{
    AnyStore, ApiClient, ApiError, ClientConfig, Method, MultipartForm, Resource, SessionError,
    SessionManager, StoreKind,
};

const GENERIC_FAILURE: &str = "Request failed. Please try again.";

#[derive(Parser, Debug)]
#[command(name = "forensic-client", version, about = "Case-management backend client")]
pub struct Args {
    /// Backend base URL (overrides FORENSIC_API_URL)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Credential store: keychain, file or memory
    #[arg(long, global = true)]
    pub store: Option<StoreKind>,

    /// Request timeout in seconds (default: none)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session token
    Login {
        #[arg(long, required_unless_present = "token", requires = "password")]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Store an existing token instead of logging in
        #[arg(long, conflicts_with_all = ["email", "password"])]
        token: Option<String>,
    },
    /// Remove the stored session token
    Logout,
    /// Show the user id and role carried by the stored token
    Whoami,
    /// Send an arbitrary request
    Request {
        method: Method,
        path: String,
        /// JSON request body
        #[arg(long)]
        data: Option<String>,
        /// Extra header, e.g. -H 'X-Device: tablet'
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// List a collection
    List { resource: Resource },
    /// Fetch one item
    Show { resource: Resource, id: String },
    /// Create an item from a JSON body
    Create {
        resource: Resource,
        #[arg(long)]
        data: String,
    },
    /// Replace an item with a JSON body
    Update {
        resource: Resource,
        id: String,
        #[arg(long)]
        data: String,
    },
    /// Delete an item
    Delete { resource: Resource, id: String },
    /// Create an item from form fields and files (multipart)
    Upload {
        resource: Resource,
        /// Text field, name=value
        #[arg(long = "field")]
        fields: Vec<String>,
        /// File field, name=path
        #[arg(long = "file", required = true)]
        files: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("{0}")]
    Input(String),
}

impl CliError {
    fn api_error(&self) -> Option<&ApiError> {
        match self {
            CliError::Api(e) | CliError::Session(SessionError::Api(e)) => Some(e),
            _ => None,
        }
    }

    /// 2 when the backend was unreachable, 1 for everything else.
    pub fn exit_code(&self) -> u8 {
        match self.api_error() {
            Some(e) if e.is_transport() => 2,
            _ => 1,
        }
    }
}

/// Print a failure the way a user should see it: the backend's own message
/// when it sent one, a generic line otherwise.
pub fn report(err: &CliError) {
    match err.api_error() {
        Some(api) => {
            match api.status_code() {
                Some(status) => eprintln!("error ({}): {}", status, api.user_message(GENERIC_FAILURE)),
                None => eprintln!("error: {}", api.user_message(GENERIC_FAILURE)),
            }
            log::debug!("{}", api);
            if api.is_unauthorized() {
                eprintln!("hint: run `forensic-client login` to start a new session");
            }
        }
        None => eprintln!("error: {}", err),
    }
}

pub async fn run(args: Args) -> Result<(), CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = args.base_url.as_deref() {
        config.base_url = parse_base_url(url)?;
    }
    if let Some(kind) = args.store {
        config.credential_store = kind;
    }
    if let Some(secs) = args.timeout.filter(|s| *s > 0) {
        config.timeout = Some(std::time::Duration::from_secs(secs));
    }

    let store = AnyStore::open(config.credential_store)?;
    log::debug!("Backend {} ({} credential store)", config.base_url, store.kind());

    let client = ApiClient::from_config(&config, store.clone());
    let session = SessionManager::from_config(&config, store);

    match args.command {
        Command::Login {
            email,
            password,
            token,
        } => {
            if let Some(token) = token {
                session.store_token(&token).await?;
                println!("Token stored.");
                return Ok(());
            }
            let request = LoginRequest {
                email: email.unwrap_or_default(),
                password: password.unwrap_or_default(),
            };
            match session.login(&client, &request).await? {
                Some(claims) => print_json(&serde_json::to_value(claims).unwrap_or(Value::Null)),
                None => println!("Logged in."),
            }
        }
        Command::Logout => {
            session.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => match session.claims().await {
            Ok(claims) => print_json(&serde_json::to_value(claims).unwrap_or(Value::Null)),
            Err(SessionError::NotLoggedIn) => println!("Not logged in."),
            Err(e) => return Err(e.into()),
        },
        Command::Request {
            method,
            path,
            data,
            headers,
        } => {
            let mut request = ApiRequest::new(method, &path).headers(parse_headers(&headers)?);
            if let Some(data) = data {
                request = request.body(parse_json(&data)?);
            }
            print_response(client.send(request).await?);
        }
        Command::List { resource } => print_json(&client.resource(resource).list().await?),
        Command::Show { resource, id } => print_json(&client.resource(resource).get(&id).await?),
        Command::Create { resource, data } => {
            let body = parse_json(&data)?;
            print_json(&client.resource(resource).create(&body).await?);
        }
        Command::Update { resource, id, data } => {
            let body = parse_json(&data)?;
            print_json(&client.resource(resource).update(&id, &body).await?);
        }
        Command::Delete { resource, id } => {
            print_json(&client.resource(resource).delete(&id).await?);
        }
        Command::Upload {
            resource,
            fields,
            files,
        } => {
            let form = build_form(&fields, &files).await?;
            print_json(&client.resource(resource).create_multipart(form).await?);
        }
    }

    Ok(())
}

fn print_response(resp: ApiResponse) {
    log::debug!("Response status {}", resp.status);
    print_json(&resp.body);
}

fn print_json(body: &Value) {
    if body.is_null() {
        return;
    }
    match serde_json::to_string_pretty(body) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", body),
    }
}

fn parse_json(raw: &str) -> Result<Value, CliError> {
    serde_json::from_str(raw).map_err(|e| CliError::Input(format!("--data is not valid JSON: {}", e)))
}

fn parse_headers(raw: &[String]) -> Result<HeaderMap, CliError> {
    let mut headers = HeaderMap::new();
    for line in raw {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| CliError::Input(format!("header '{}' is not 'Name: value'", line)))?;
        let name = HeaderName::from_bytes(name.trim().as_bytes())
            .map_err(|e| CliError::Input(format!("bad header name '{}': {}", name.trim(), e)))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| CliError::Input(format!("bad value for header {}: {}", name, e)))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn split_pair<'a>(raw: &'a str, flag: &str) -> Result<(&'a str, &'a str), CliError> {
    raw.split_once('=')
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, value)| (name.trim(), value))
        .ok_or_else(|| CliError::Input(format!("--{} '{}' is not name=value", flag, raw)))
}

async fn build_form(fields: &[String], files: &[String]) -> Result<MultipartForm, CliError> {
    let mut form = MultipartForm::new();
    for raw in fields {
        let (name, value) = split_pair(raw, "field")?;
        form = form.text(name, value);
    }
    for raw in files {
        let (name, path) = split_pair(raw, "file")?;
        let path = Path::new(path);
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CliError::Input(format!("cannot read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        form = form.file(name, &file_name, guess_mime(path), bytes);
    }
    Ok(form)
}

fn guess_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    Some(match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "heic" => "image/heic",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "json" => "application/json",
        "mp4" => "video/mp4",
        _ => return None,
    })
}
