use std::fmt;

use crate::{
    TokenRetriever, TokenRetrieverError, credentials::CredentialsSettings, http_client::HttpClient,
    settings::TokenProviderSettings, token::Token,
};

use super::{AccountTokenRetriever, ProjectTokenRetriever};

/// HTTP-based token retriever.
///
/// It will work with both project and account credentials, informed by [`CredentialsSettings`].
pub enum HttpTokenRetriever<C: HttpClient> {
    Project(ProjectTokenRetriever<C>),
    Account(AccountTokenRetriever<C>),
}

impl<C: HttpClient> fmt::Debug for HttpTokenRetriever<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpTokenRetriever::Project(retriever) => {
                f.debug_tuple("Project").field(retriever).finish()
            }
            HttpTokenRetriever::Account(retriever) => {
                f.debug_tuple("Account").field(retriever).finish()
            }
        }
    }
}

impl<C> TokenRetriever for HttpTokenRetriever<C>
where
    C: HttpClient,
{
    fn retrieve(&self) -> Result<Token, TokenRetrieverError> {
        match self {
            HttpTokenRetriever::Project(retriever) => retriever.retrieve(),
            HttpTokenRetriever::Account(retriever) => retriever.retrieve(),
        }
    }
}

impl<C> HttpTokenRetriever<C>
where
    C: HttpClient,
{
    /// Creates the retriever matching the grant of the provided credentials.
    pub fn new(
        http_client: C,
        credentials: CredentialsSettings,
        settings: TokenProviderSettings,
    ) -> Self {
        match credentials {
            CredentialsSettings::Project(project) => HttpTokenRetriever::Project(
                ProjectTokenRetriever::new(project, http_client, settings),
            ),
            CredentialsSettings::Account(account) => HttpTokenRetriever::Account(
                AccountTokenRetriever::new(account, http_client, settings),
            ),
        }
    }
}
