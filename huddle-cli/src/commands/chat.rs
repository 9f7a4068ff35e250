use std::{collections::HashMap, io::Write as _};

use anyhow::{Context, Result, bail};
use clap::Args;
use futures_util::StreamExt;
use shared::{
    client::{
        CachedMessage, ChatAction, ChatState, DeliveryStatus, LoadPhase, PageRequest, RetryPolicy,
        with_retry,
    },
    models::{
        Conversation, CreateConversationRequest, DEFAULT_PAGE_SIZE, HistoryQuery, MessageKind,
        MessageView, SendMessageRequest, SenderProfile, Timestamp,
    },
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    time::sleep,
};
use uuid::Uuid;

use super::{
    client::{ApiClient, ConnectArgs},
    stream::SseParser,
};
use shared::models::ChatStreamEvent;

#[derive(Args, Debug)]
#[command(about = "Open a personal conversation or create a group")]
pub struct OpenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Other participant(s). Exactly one unless --group is set.
    #[arg(long = "with", required = true)]
    pub participants: Vec<Uuid>,

    /// Create a group conversation
    #[arg(long)]
    pub group: bool,

    /// Group display name
    #[arg(long, requires = "group")]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
#[command(about = "Print a conversation's history, oldest first")]
pub struct HistoryArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Conversation identifier
    #[arg(long, alias = "conv")]
    pub conversation: Uuid,

    /// Page size
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub limit: u32,

    /// Keep fetching older pages until the beginning of the conversation
    #[arg(long)]
    pub all: bool,
}

#[derive(Args, Debug)]
#[command(about = "Send one message")]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Conversation identifier
    #[arg(long, alias = "conv")]
    pub conversation: Uuid,

    /// Payload kind: text, image, video or call
    #[arg(long, default_value = "text", value_parser = parse_kind)]
    pub kind: MessageKind,

    /// Text, or the uploaded URL for image and video
    pub content: String,
}

#[derive(Args, Debug)]
#[command(about = "Follow a conversation live; lines typed on stdin are sent")]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Conversation identifier
    #[arg(long, alias = "conv")]
    pub conversation: Uuid,
}

fn parse_kind(value: &str) -> Result<MessageKind, String> {
    MessageKind::try_from(value).map_err(str::to_string)
}

pub async fn handle_conversations(args: ConnectArgs) -> Result<()> {
    let client = ApiClient::connect(&args)?;
    let conversations = client.conversations().await?;
    if conversations.is_empty() {
        println!("No conversations yet.");
        return Ok(());
    }
    for conversation in &conversations {
        println!("{}", describe(conversation, client.user_id()));
    }
    Ok(())
}

pub async fn handle_open(args: OpenArgs) -> Result<()> {
    check_participants(&args)?;
    let client = ApiClient::connect(&args.connect)?;
    let request = CreateConversationRequest {
        participant_ids: args.participants,
        is_group: args.group,
        name: args.name,
    };
    let conversation = client.open(&request).await?;
    println!("{}", describe(&conversation, client.user_id()));
    Ok(())
}

pub async fn handle_history(args: HistoryArgs) -> Result<()> {
    let client = ApiClient::connect(&args.connect)?;
    let limit = args.limit.max(1);
    let policy = RetryPolicy::default();

    let mut pages: Vec<Vec<MessageView>> = Vec::new();
    let mut query = HistoryQuery::latest(limit);
    loop {
        let page = with_retry(
            policy,
            |_| client.history(args.conversation, &query),
            sleep,
        )
        .await
        .context("failed to fetch history")?;

        let short = page.len() < limit as usize;
        let oldest = page.first().cloned();
        pages.push(page);
        match oldest {
            Some(oldest) if args.all && !short => {
                query = HistoryQuery::older_than(&oldest, limit);
            }
            _ => break,
        }
    }

    let mut printed = 0;
    for message in pages.iter().rev().flatten() {
        println!("{}", render(message, &DeliveryStatus::Sent));
        printed += 1;
    }
    if printed == 0 {
        println!("No messages yet.");
    }
    Ok(())
}

pub async fn handle_send(args: SendArgs) -> Result<()> {
    let client = ApiClient::connect(&args.connect)?;
    let request = SendMessageRequest {
        kind: args.kind,
        content: args.content,
        message_id: Some(Uuid::new_v4()),
    };
    let message = client
        .send(args.conversation, &request)
        .await
        .context("message was not sent")?;
    println!("{}", render(&message, &DeliveryStatus::Sent));
    Ok(())
}

pub async fn handle_watch(args: WatchArgs) -> Result<()> {
    let client = ApiClient::connect(&args.connect)?;
    let me = client.me().await?;
    let mut view = WatchView::new(client, me, args.conversation);

    view.open().await;
    println!(
        "Watching {} as {}. Type a line and press enter to send; Ctrl+C to stop.",
        args.conversation, view.me.display_name
    );

    tokio::select! {
        result = view.run() => result,
        _ = tokio::signal::ctrl_c() => {
            println!();
            Ok(())
        }
    }
}

/// What the stream loop does after handling an event.
#[derive(Debug, PartialEq, Eq)]
enum StreamFlow {
    Continue,
    /// Drop this connection and open a new one.
    Reconnect,
}

/// Terminal front-end driving a [`ChatState`].
struct WatchView {
    client: ApiClient,
    me: SenderProfile,
    conversation_id: Uuid,
    state: ChatState,
    policy: RetryPolicy,
    /// Status each entry was last printed with.
    printed: HashMap<Uuid, DeliveryStatus>,
}

impl WatchView {
    fn new(client: ApiClient, me: SenderProfile, conversation_id: Uuid) -> Self {
        let state = ChatState::new(me.id, DEFAULT_PAGE_SIZE);
        Self {
            client,
            me,
            conversation_id,
            state,
            policy: RetryPolicy::default(),
            printed: HashMap::new(),
        }
    }

    async fn open(&mut self) {
        let request = self.state.apply(ChatAction::Open {
            conversation_id: self.conversation_id,
        });
        self.drive(request).await;
    }

    /// Runs fetches the reducer asks for until it stops asking.
    async fn drive(&mut self, mut next: Option<PageRequest>) {
        while let Some(request) = next {
            let result = with_retry(
                self.policy,
                |_| self.client.history(request.conversation_id, &request.query),
                sleep,
            )
            .await;
            let action = match result {
                Ok(messages) => request.loaded(messages),
                Err(err) => request.failed(err.to_string()),
            };
            next = self.state.apply(action);
        }

        if let LoadPhase::Error { message, .. } = self.state.phase() {
            eprintln!("[history] {message}; type /retry to try again");
        }
        self.flush();
    }

    /// Prints entries that are new or changed status since they were last shown. Sends still in
    /// flight wait for their outcome.
    fn flush(&mut self) {
        let fresh: Vec<CachedMessage> = self
            .state
            .messages()
            .into_iter()
            .filter(|entry| entry.status != DeliveryStatus::Pending)
            .filter(|entry| self.printed.get(&entry.id()) != Some(&entry.status))
            .collect();
        for entry in fresh {
            println!("{}", render(&entry.message, &entry.status));
            self.printed.insert(entry.id(), entry.status);
        }
        std::io::stdout().flush().ok();
    }

    async fn run(&mut self) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut attempt = 0;

        loop {
            let response = match self.client.open_stream().await {
                Ok(response) => {
                    attempt = 0;
                    response
                }
                Err(err) => {
                    attempt += 1;
                    let delay = self.policy.delay_after(attempt);
                    eprintln!("[stream] {err:#}; reconnecting in {delay:?}");
                    sleep(delay).await;
                    continue;
                }
            };

            let mut body = response.bytes_stream();
            let mut parser = SseParser::default();
            'stream: loop {
                tokio::select! {
                    chunk = body.next() => {
                        let Some(chunk) = chunk else {
                            eprintln!("[stream] closed by server");
                            break;
                        };
                        let bytes = match chunk {
                            Ok(bytes) => bytes,
                            Err(err) => {
                                eprintln!("[stream] read failed: {err}");
                                break;
                            }
                        };
                        for frame in parser.push(&bytes) {
                            match frame.decode() {
                                Ok(event) => {
                                    if self.on_event(event).await == StreamFlow::Reconnect {
                                        break 'stream;
                                    }
                                }
                                Err(err) => eprintln!(
                                    "[stream] unreadable {} event: {err}",
                                    frame.event.as_deref().unwrap_or("message")
                                ),
                            }
                        }
                    }
                    line = lines.next_line() => {
                        match line.context("failed to read stdin")? {
                            Some(line) => self.on_input(line.trim()).await,
                            None => return Ok(()),
                        }
                    }
                }
            }

            sleep(self.policy.base_delay).await;
        }
    }

    async fn on_event(&mut self, event: ChatStreamEvent) -> StreamFlow {
        match event {
            ChatStreamEvent::ConnectionReady { payload } => {
                if let Err(err) = self
                    .client
                    .join(payload.connection_id, self.conversation_id)
                    .await
                {
                    eprintln!("[stream] failed to join the conversation: {err:#}; reconnecting");
                    return StreamFlow::Reconnect;
                }
                // Messages sent before the join were never pushed; fetch the newest page again.
                let request = self.state.apply(ChatAction::Reconnected);
                self.drive(request).await;
            }
            ChatStreamEvent::MessageNew { payload } => {
                self.state.apply(ChatAction::Pushed {
                    message: payload.message,
                });
                self.flush();
            }
            ChatStreamEvent::Error { payload } => {
                eprintln!("[stream error {}] {}", payload.code, payload.message);
            }
        }
        StreamFlow::Continue
    }

    async fn on_input(&mut self, line: &str) {
        match line {
            "" => {}
            "/older" => {
                let request = self.state.apply(ChatAction::OlderRequested);
                if request.is_none() {
                    println!("[history] nothing older to load");
                    return;
                }
                // Older pages land above what is already printed; reprint the whole sequence.
                self.drive(request).await;
                self.reprint();
            }
            "/retry" => {
                let request = self.state.apply(ChatAction::Retry);
                self.drive(request).await;
            }
            text => self.send(text).await,
        }
    }

    fn reprint(&mut self) {
        println!("----");
        self.printed.clear();
        self.flush();
    }

    async fn send(&mut self, text: &str) {
        let optimistic = MessageView {
            id: Uuid::new_v4(),
            conversation_id: self.conversation_id,
            sender: self.me.clone(),
            kind: MessageKind::Text,
            content: text.to_string(),
            created_at: Timestamp::now(),
        };
        let request = SendMessageRequest {
            message_id: Some(optimistic.id),
            ..SendMessageRequest::text(text)
        };
        self.state.apply(ChatAction::OptimisticSend {
            message: optimistic.clone(),
        });

        match self.client.send(self.conversation_id, &request).await {
            Ok(stored) => {
                self.state.apply(ChatAction::SendConfirmed { message: stored });
            }
            Err(err) => {
                self.state.apply(ChatAction::SendFailed {
                    message_id: optimistic.id,
                    reason: err.to_string(),
                });
            }
        }
        self.flush();
    }
}

fn describe(conversation: &Conversation, me: Uuid) -> String {
    let label = if conversation.is_group {
        conversation
            .name
            .clone()
            .unwrap_or_else(|| format!("group of {}", conversation.participants.len()))
    } else {
        conversation
            .peer_of(me)
            .map_or_else(|| "personal".to_string(), |peer| format!("with {peer}"))
    };
    format!(
        "- {} {} (last activity {})",
        conversation.id,
        label,
        conversation.last_activity_at.0.format("%Y-%m-%d %H:%M:%S")
    )
}

fn render(message: &MessageView, status: &DeliveryStatus) -> String {
    let marker = match status {
        DeliveryStatus::Sent => String::new(),
        DeliveryStatus::Pending => " (sending)".to_string(),
        DeliveryStatus::Failed { reason } => format!(" (failed: {reason})"),
    };
    let body = match message.kind {
        MessageKind::Text => message.content.clone(),
        MessageKind::Image => format!("[image] {}", message.content),
        MessageKind::Video => format!("[video] {}", message.content),
        MessageKind::Call => format!("[call {}]", message.content),
    };
    format!(
        "[{}] {}: {}{}",
        message.created_at.0.format("%H:%M:%S"),
        message.sender.display_name,
        body,
        marker
    )
}

/// Rejects obviously unusable arguments before any network call.
pub fn check_participants(args: &OpenArgs) -> Result<()> {
    if !args.group && args.participants.len() != 1 {
        bail!("a personal conversation takes exactly one --with participant");
    }
    Ok(())
}
