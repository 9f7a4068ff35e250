//! Thin HTTP client over the Huddle API.

use anyhow::{Context, Result, anyhow};
use clap::Args;
use reqwest::{Client, Response, header};
use serde::{Serialize, de::DeserializeOwned};
use shared::{
    client::FetchError,
    config::server::IdentityConfig,
    models::{
        Conversation, ConversationListResponse, ConversationResponse, CreateConversationRequest,
        HistoryQuery, HistoryResponse, MeResponse, MembershipResponse, MessageView, ProblemBody,
        SendMessageRequest, SendMessageResponse, SenderProfile,
    },
};
use url::Url;
use uuid::Uuid;

use super::session;

#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Huddle server base URL
    #[arg(long, default_value = "http://localhost:8080")]
    pub server: String,

    /// Act as this user id instead of the saved identity
    #[arg(long)]
    pub user: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    api_base: Url,
    user_id: Uuid,
}

impl ApiClient {
    pub fn connect(args: &ConnectArgs) -> Result<Self> {
        let user_id = session::resolve_identity(args.user)?;
        let server_url = Url::parse(&args.server).context("invalid server URL")?;
        let api_base = server_url
            .join("api/")
            .context("invalid API base for the server URL")?;
        Self::new(api_base, user_id)
    }

    pub fn new(api_base: Url, user_id: Uuid) -> Result<Self> {
        let header_name = IdentityConfig::default().user_header;
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::HeaderName::from_bytes(header_name.as_bytes())
                .context("invalid identity header name")?,
            header::HeaderValue::from_str(&user_id.to_string())
                .context("invalid identity header value")?,
        );
        let http = Client::builder()
            .default_headers(headers)
            .user_agent("huddle-cli")
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            api_base,
            user_id,
        })
    }

    #[must_use]
    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.api_base
            .join(path)
            .map_err(|err| FetchError::Permanent(format!("invalid endpoint {path}: {err}")))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&HistoryQuery>,
    ) -> Result<T, FetchError> {
        let mut request = self.http.get(self.endpoint(path)?);
        if let Some(query) = query {
            request = request.query(query);
        }
        decode(request.send().await).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, FetchError> {
        let request = self.http.post(self.endpoint(path)?).json(body);
        decode(request.send().await).await
    }

    pub async fn me(&self) -> Result<SenderProfile> {
        let response: MeResponse = self.get("me", None).await?;
        Ok(response.profile)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>> {
        let response: ConversationListResponse = self.get("conversations", None).await?;
        Ok(response.conversations)
    }

    pub async fn open(&self, request: &CreateConversationRequest) -> Result<Conversation> {
        let response: ConversationResponse = self.post("conversations", request).await?;
        Ok(response.conversation)
    }

    /// One history page, oldest first. Errors are classified for [`shared::client::with_retry`].
    pub async fn history(
        &self,
        conversation_id: Uuid,
        query: &HistoryQuery,
    ) -> Result<Vec<MessageView>, FetchError> {
        let response: HistoryResponse = self
            .get(&format!("conversations/{conversation_id}/messages"), Some(query))
            .await?;
        Ok(response.messages)
    }

    pub async fn send(
        &self,
        conversation_id: Uuid,
        request: &SendMessageRequest,
    ) -> Result<MessageView, FetchError> {
        let response: SendMessageResponse = self
            .post(&format!("conversations/{conversation_id}/messages"), request)
            .await?;
        Ok(response.message)
    }

    pub async fn join(
        &self,
        connection_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<MembershipResponse> {
        let url = self.endpoint(&format!(
            "stream/{connection_id}/conversations/{conversation_id}"
        ))?;
        Ok(decode(self.http.put(url).send().await).await?)
    }

    /// Opens the event stream. The body is read incrementally by the caller.
    pub async fn open_stream(&self) -> Result<Response> {
        let url = self.endpoint("stream")?;
        let response = self
            .http
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .context("failed to open event stream")?;
        if !response.status().is_success() {
            return Err(anyhow!(problem_of(response).await));
        }
        Ok(response)
    }
}

async fn decode<T: DeserializeOwned>(
    sent: reqwest::Result<Response>,
) -> Result<T, FetchError> {
    let response = sent.map_err(|err| FetchError::Transient(format!("request failed: {err}")))?;
    if !response.status().is_success() {
        return Err(problem_of(response).await.into());
    }
    response
        .json()
        .await
        .map_err(|err| FetchError::Permanent(format!("unexpected response body: {err}")))
}

/// Reads the problem body of a failed call, synthesizing one when the server sent none.
async fn problem_of(response: Response) -> ProblemBody {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str(&text).unwrap_or_else(|_| ProblemBody {
        problem_type: String::new(),
        title: status.canonical_reason().unwrap_or("Error").to_string(),
        status: status.as_u16(),
        code: "http_error".into(),
        message: if text.is_empty() {
            status.to_string()
        } else {
            text
        },
        details: None,
    })
}
