//! [`LegacyTransport`] over HTTPS using `reqwest`.

use super::{LegacyAuthError, LegacyTransport};
use crate::{
    api::{
        LegacyAgent, LegacyAuthResponse, LegacyAuthenticateRequest, LegacyErrorResponse,
        LegacyInvalidateRequest, LegacyRefreshRequest,
    },
    option::LegacyAuthOptions,
};
use futures::future::BoxFuture;
use reqwest::{StatusCode, header::ACCEPT};
use serde::Serialize;

const INVALID_CREDENTIALS_ERROR: &str = "ForbiddenOperationException";
const ERROR_SNIPPET_CHARS: usize = 240;

/// The default HTTPS transport for the legacy provider.
#[derive(Debug, Clone)]
pub struct HttpLegacyTransport {
    client: reqwest::Client,
    options: LegacyAuthOptions,
}

impl HttpLegacyTransport {
    pub fn new(client: reqwest::Client, options: LegacyAuthOptions) -> Self {
        Self { client, options }
    }

    pub fn with_options(options: LegacyAuthOptions) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout())
            .build()?;
        Ok(Self::new(client, options))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.options.base_url.trim_end_matches('/'))
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<(StatusCode, String), LegacyAuthError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(LegacyAuthError::request)?;
        let status = response.status();
        let body = response.text().await.map_err(LegacyAuthError::request)?;
        if !status.is_success() {
            return Err(legacy_error(status, &body));
        }
        Ok((status, body))
    }

    async fn post_for_session<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<LegacyAuthResponse, LegacyAuthError> {
        let (_, body) = self.post(path, body).await?;
        serde_json::from_str(&body).map_err(|e| LegacyAuthError::Malformed(e.to_string()))
    }
}

impl LegacyTransport for HttpLegacyTransport {
    fn authenticate<'a>(
        &'a self,
        username: &'a str,
        password: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>> {
        Box::pin(async move {
            let request = LegacyAuthenticateRequest {
                agent: LegacyAgent {
                    name: &self.options.agent_name,
                    version: self.options.agent_version,
                },
                username,
                password,
                client_token,
                request_user: true,
            };
            self.post_for_session("authenticate", &request).await
        })
    }

    fn refresh<'a>(
        &'a self,
        access_token: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<LegacyAuthResponse, LegacyAuthError>> {
        Box::pin(async move {
            let request = LegacyRefreshRequest {
                access_token,
                client_token,
                request_user: true,
            };
            self.post_for_session("refresh", &request).await
        })
    }

    fn invalidate<'a>(
        &'a self,
        access_token: &'a str,
        client_token: &'a str,
    ) -> BoxFuture<'a, Result<(), LegacyAuthError>> {
        Box::pin(async move {
            let request = LegacyInvalidateRequest {
                access_token,
                client_token,
            };
            self.post("invalidate", &request).await.map(|_| ())
        })
    }
}

fn legacy_error(status: StatusCode, body: &str) -> LegacyAuthError {
    match serde_json::from_str::<LegacyErrorResponse>(body) {
        Ok(error) if error.error == INVALID_CREDENTIALS_ERROR => LegacyAuthError::InvalidCredentials(
            error.error_message.unwrap_or(error.error),
        ),
        Ok(error) => LegacyAuthError::Rejected {
            status: status.as_u16(),
            detail: match error.error_message {
                Some(message) => format!("{}: {message}", error.error),
                None => error.error,
            },
        },
        Err(_) => LegacyAuthError::Rejected {
            status: status.as_u16(),
            detail: body.trim().chars().take(ERROR_SNIPPET_CHARS).collect(),
        },
    }
}
