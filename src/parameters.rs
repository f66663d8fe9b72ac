use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::error::ErrorKind;
use clap::{Args, Error, Subcommand, ValueEnum};
use http::Uri;

use crate::client::ClientOptions;
use crate::settings::Environment;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Retrieve a token with the credentials of exactly one source.
    RetrieveToken {
        /// Options for configuring the credentials, only one source may be complete.
        #[command(flatten)]
        credentials: CredentialArgs,

        #[command(flatten)]
        environment: EnvironmentArgs,

        /// Select format how the Token should be obtained
        #[arg(long, default_value = "Plain")]
        output_token_format: OutPutTokenFormat,
    },
    /// Perform one authenticated request against the UP42 API and print the response body.
    Request {
        #[command(flatten)]
        credentials: CredentialArgs,

        #[command(flatten)]
        environment: EnvironmentArgs,

        /// HTTP method of the request
        #[arg(long, default_value = "GET")]
        method: String,

        /// API path, for example `/v2/assets`
        #[arg(long, required = true)]
        path: String,

        /// JSON body sent with the request
        #[arg(long)]
        body: Option<String>,

        /// Print the body of 4xx and 5xx responses instead of failing
        #[arg(long, default_value_t = false)]
        allow_error_status: bool,
    },
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
pub enum OutPutTokenFormat {
    /// Returns only the access token without expiration date
    #[value(name = "Plain")]
    Plain,
    /// Returns full token information in json format
    #[value(name = "Json")]
    Json,
}

#[derive(Args, Clone, Default)]
pub struct CredentialArgs {
    /// Path to a JSON file holding `username`/`password` or `project_id`/`project_api_key`
    #[arg(long)]
    cfg_file: Option<PathBuf>,

    /// Project ID, project authentication is deprecated
    #[arg(long)]
    project_id: Option<String>,

    /// Project API key, project authentication is deprecated
    #[arg(long)]
    project_api_key: Option<String>,

    /// Account username (email)
    #[arg(long)]
    username: Option<String>,

    /// Account password
    #[arg(long)]
    password: Option<String>,
}

impl fmt::Debug for CredentialArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&ClientOptions::from(self.clone()), f)
    }
}

impl From<CredentialArgs> for ClientOptions {
    fn from(args: CredentialArgs) -> Self {
        ClientOptions {
            cfg_file: args.cfg_file,
            project_id: args.project_id,
            project_api_key: args.project_api_key,
            username: args.username,
            password: args.password,
        }
    }
}

#[derive(ValueEnum, Clone, Debug, PartialEq, Default)]
pub enum Environments {
    #[default]
    #[value(name = "com")]
    Com,
    #[value(name = "dev")]
    Dev,
    #[value(name = "custom")]
    Custom,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArgs {
    /// Environment to target
    #[arg(long, short, default_value = "com")]
    environment: Environments,

    /// Custom token endpoint. Required with '--environment custom'.
    #[arg(long)]
    token_url: Option<String>,

    /// Custom API base URL. Required with '--environment custom'.
    #[arg(long)]
    api_url: Option<String>,
}

impl TryFrom<EnvironmentArgs> for Environment {
    type Error = Error;

    fn try_from(args: EnvironmentArgs) -> Result<Self, Self::Error> {
        select_environment(args.environment, args.token_url, args.api_url)
    }
}

pub fn select_environment(
    environment: Environments,
    token_url: Option<String>,
    api_url: Option<String>,
) -> Result<Environment, Error> {
    match environment {
        Environments::Com => Ok(Environment::Production),
        Environments::Dev => Ok(Environment::Staging),
        Environments::Custom => {
            let token_uri_str = token_url.unwrap_or_default();
            let api_uri_str = api_url.unwrap_or_default();

            let token_uri = Uri::from_str(&token_uri_str)
                .map_err(|e| Error::raw(ErrorKind::Format, format!("Invalid token URI: {e}")))?;
            let api_uri = Uri::from_str(&api_uri_str)
                .map_err(|e| Error::raw(ErrorKind::Format, format!("Invalid API URI: {e}")))?;

            Ok(Environment::Custom {
                api_url: api_uri,
                token_url: token_uri,
            })
        }
    }
}
