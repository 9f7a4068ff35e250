use reqwest::{Client, Response};
use serde::{Serialize, de::DeserializeOwned};
use shared::{
    client::FetchError,
    models::{
        Conversation, ConversationListResponse, ConversationResponse, CreateConversationRequest,
        HistoryQuery, HistoryResponse, MeResponse, MembershipResponse, MessageView, ProblemBody,
        SendMessageRequest, SendMessageResponse, SenderProfile,
    },
};
use uuid::Uuid;

const USER_HEADER: &str = "x-user-id";
/// Query parameter the development server accepts where headers cannot be set.
const USER_QUERY_PARAM: &str = "user_id";

/// API client bound to one caller identity. Passed down to the pages that need it.
#[derive(Clone, Debug)]
pub struct HuddleClient {
    base_url: String,
    user_id: Uuid,
    client: Client,
}

// The reqwest client is a connection pool; two handles are equal when they address the same API
// as the same user.
impl PartialEq for HuddleClient {
    fn eq(&self, other: &Self) -> bool {
        self.base_url == other.base_url && self.user_id == other.user_id
    }
}

impl HuddleClient {
    pub fn new(origin: &str, user_id: Uuid) -> Self {
        Self {
            base_url: format!("{}/api", origin.trim_end_matches('/')),
            user_id,
            client: Client::new(),
        }
    }

    /// Client for the page's own origin.
    pub fn for_window(user_id: Uuid) -> Option<Self> {
        let origin = web_sys::window()?.location().origin().ok()?;
        Some(Self::new(&origin, user_id))
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `EventSource` cannot send headers, so the stream URL carries the identity.
    pub fn stream_url(&self) -> String {
        format!("{}?{USER_QUERY_PARAM}={}", self.api_url("stream"), self.user_id)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&HistoryQuery>,
    ) -> Result<T, FetchError> {
        let mut request = self
            .client
            .get(self.api_url(path))
            .header(USER_HEADER, self.user_id.to_string());
        if let Some(query) = query {
            request = request.query(query);
        }
        decode(request.send().await).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, FetchError> {
        let mut request = self
            .client
            .request(method, self.api_url(path))
            .header(USER_HEADER, self.user_id.to_string());
        if let Some(body) = body {
            request = request.json(body);
        }
        decode(request.send().await).await
    }

    pub async fn me(&self) -> Result<SenderProfile, FetchError> {
        let response: MeResponse = self.get("me", None).await?;
        Ok(response.profile)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, FetchError> {
        let response: ConversationListResponse = self.get("conversations", None).await?;
        Ok(response.conversations)
    }

    pub async fn open_personal(&self, peer: Uuid) -> Result<Conversation, FetchError> {
        let response: ConversationResponse = self
            .send_json(
                reqwest::Method::POST,
                "conversations",
                Some(&CreateConversationRequest::personal(peer)),
            )
            .await?;
        Ok(response.conversation)
    }

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
            .send_json(
                reqwest::Method::POST,
                &format!("conversations/{conversation_id}/messages"),
                Some(request),
            )
            .await?;
        Ok(response.message)
    }

    pub async fn join(
        &self,
        connection_id: Uuid,
        conversation_id: Uuid,
    ) -> Result<MembershipResponse, FetchError> {
        self.send_json::<(), _>(
            reqwest::Method::PUT,
            &format!("stream/{connection_id}/conversations/{conversation_id}"),
            None,
        )
        .await
    }
}

async fn decode<T: DeserializeOwned>(sent: reqwest::Result<Response>) -> Result<T, FetchError> {
    let response = sent.map_err(|err| FetchError::Transient(err.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let problem = serde_json::from_str::<ProblemBody>(&text).unwrap_or(ProblemBody {
            problem_type: String::new(),
            title: String::new(),
            status: status.as_u16(),
            code: "http_error".into(),
            message: status.to_string(),
            details: None,
        });
        return Err(problem.into());
    }
    response
        .json()
        .await
        .map_err(|err| FetchError::Permanent(err.to_string()))
}
