//! Reducer that owns the client's view of one open conversation.
//!
//! Every input (history pages, optimistic sends, confirmations and realtime pushes) goes through
//! [`ChatState::apply`], which keeps the message sequence deduplicated and decides which history
//! fetch, if any, should run next.

use uuid::Uuid;

use super::cache::{CachedMessage, DeliveryStatus, MessageCache};
use crate::models::{HistoryQuery, MessageView, DEFAULT_PAGE_SIZE};

/// Which slice of history a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// Newest page right after opening a conversation.
    First,
    /// Page strictly older than the oldest cached message.
    Older,
    /// Newest page again, to catch up after a realtime reconnect.
    Resync,
}

/// A history fetch issued by the reducer. Results are only accepted for the same epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub conversation_id: Uuid,
    pub epoch: u64,
    pub seq: u64,
    pub kind: PageKind,
    pub query: HistoryQuery,
}

impl PageRequest {
    /// Requested page size.
    #[must_use]
    pub fn limit(&self) -> u32 {
        self.query.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    /// The action reporting that this request returned `messages`.
    #[must_use]
    pub fn loaded(self, messages: Vec<MessageView>) -> ChatAction {
        match self.kind {
            PageKind::First => ChatAction::FirstPageLoaded {
                request: self,
                messages,
            },
            PageKind::Older => ChatAction::OlderPageLoaded {
                request: self,
                messages,
            },
            PageKind::Resync => ChatAction::ResyncLoaded {
                request: self,
                messages,
            },
        }
    }

    #[must_use]
    pub fn failed(self, error: impl Into<String>) -> ChatAction {
        ChatAction::LoadFailed {
            request: self,
            error: error.into(),
        }
    }
}

/// Where history loading stands for the open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPhase {
    /// No conversation is open.
    Idle,
    LoadingFirst,
    /// Loaded; older pages and resyncs may be requested.
    Ready,
    LoadingOlder,
    /// History could not be loaded; `Retry` reissues `failed`.
    Error { message: String, failed: PageRequest },
}

/// What the last applied action did to the visible sequence. Views use it to choose between
/// keeping the scroll anchor and following new messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    None,
    /// Fresh sequence, e.g. the first page.
    Reset,
    /// Older messages were added at the top.
    Prepended,
    /// Newer messages were added at the bottom.
    Appended,
    /// Existing entries changed in place.
    Updated,
}

/// Everything that can change a [`ChatState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatAction {
    /// Show `conversation_id`, dropping whatever was open.
    Open { conversation_id: Uuid },
    Close,
    FirstPageLoaded { request: PageRequest, messages: Vec<MessageView> },
    /// The user scrolled to the top.
    OlderRequested,
    OlderPageLoaded { request: PageRequest, messages: Vec<MessageView> },
    /// The realtime stream joined the conversation, on first connect or after a reconnect.
    /// Anything sent before the join was not pushed, so the newest page is fetched again once
    /// history is loaded.
    Reconnected,
    ResyncLoaded { request: PageRequest, messages: Vec<MessageView> },
    /// Retries are exhausted for `request`.
    LoadFailed { request: PageRequest, error: String },
    /// Reissue the request that put the state in [`LoadPhase::Error`].
    Retry,
    /// A local send started; shown as pending until confirmed.
    OptimisticSend { message: MessageView },
    /// The server stored a local send.
    SendConfirmed { message: MessageView },
    SendFailed { message_id: Uuid, reason: String },
    /// A failed send is being tried again under the same id.
    Resend { message_id: Uuid },
    /// A message from someone else arrived over the realtime stream.
    Pushed { message: MessageView },
}

/// Client view of one open conversation: the cached messages, the load phase and the history
/// request in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatState {
    local_user: Uuid,
    page_size: u32,
    conversation_id: Option<Uuid>,
    epoch: u64,
    seq: u64,
    phase: LoadPhase,
    has_more: bool,
    cache: MessageCache,
    pending: Option<PageRequest>,
    /// A join was acknowledged while history was still loading.
    resync_owed: bool,
    last_change: Change,
}

impl ChatState {
    #[must_use]
    pub fn new(local_user: Uuid, page_size: u32) -> Self {
        Self {
            local_user,
            page_size: page_size.max(1),
            conversation_id: None,
            epoch: 0,
            seq: 0,
            phase: LoadPhase::Idle,
            has_more: false,
            cache: MessageCache::new(),
            pending: None,
            resync_owed: false,
            last_change: Change::None,
        }
    }

    #[must_use]
    pub fn local_user(&self) -> Uuid {
        self.local_user
    }

    #[must_use]
    pub fn conversation_id(&self) -> Option<Uuid> {
        self.conversation_id
    }

    #[must_use]
    pub fn phase(&self) -> &LoadPhase {
        &self.phase
    }

    #[must_use]
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Messages in display order, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<CachedMessage> {
        self.cache.flatten()
    }

    /// The most recently issued fetch that has not produced a result yet.
    #[must_use]
    pub fn pending_request(&self) -> Option<&PageRequest> {
        self.pending.as_ref()
    }

    #[must_use]
    pub fn last_change(&self) -> Change {
        self.last_change
    }

    fn is_current(&self, request: &PageRequest) -> bool {
        request.epoch == self.epoch && Some(request.conversation_id) == self.conversation_id
    }

    fn issue(&mut self, kind: PageKind, query: HistoryQuery) -> Option<PageRequest> {
        let conversation_id = self.conversation_id?;
        self.seq += 1;
        let request = PageRequest {
            conversation_id,
            epoch: self.epoch,
            seq: self.seq,
            kind,
            query,
        };
        self.pending = Some(request.clone());
        Some(request)
    }

    fn settle(&mut self, request: &PageRequest) {
        if self.pending.as_ref().is_some_and(|p| p.seq == request.seq) {
            self.pending = None;
        }
    }

    /// Back to `Ready`, running the resync a join left behind while loading.
    fn become_ready(&mut self) -> Option<PageRequest> {
        self.phase = LoadPhase::Ready;
        if !std::mem::take(&mut self.resync_owed) {
            return None;
        }
        self.issue(PageKind::Resync, HistoryQuery::latest(self.page_size))
    }

    fn belongs_here(&self, message: &MessageView) -> bool {
        Some(message.conversation_id) == self.conversation_id
    }

    /// Applies `action` and returns the history fetch the caller should start, if any.
    pub fn apply(&mut self, action: ChatAction) -> Option<PageRequest> {
        self.last_change = Change::None;

        match action {
            ChatAction::Open { conversation_id } => {
                self.epoch += 1;
                self.conversation_id = Some(conversation_id);
                self.cache.clear();
                self.has_more = true;
                self.phase = LoadPhase::LoadingFirst;
                self.resync_owed = false;
                self.last_change = Change::Reset;
                self.issue(PageKind::First, HistoryQuery::latest(self.page_size))
            }
            ChatAction::Close => {
                self.epoch += 1;
                self.conversation_id = None;
                self.cache.clear();
                self.has_more = false;
                self.phase = LoadPhase::Idle;
                self.pending = None;
                self.resync_owed = false;
                self.last_change = Change::Reset;
                None
            }
            ChatAction::FirstPageLoaded { request, messages } => {
                if !self.is_current(&request) || self.phase != LoadPhase::LoadingFirst {
                    tracing::debug!(seq = request.seq, "discarding stale first page");
                    return None;
                }
                self.settle(&request);
                self.has_more = messages.len() >= request.limit() as usize;
                self.cache.merge_latest(messages);
                self.last_change = Change::Reset;
                self.become_ready()
            }
            ChatAction::OlderRequested => {
                if self.phase != LoadPhase::Ready || !self.has_more {
                    return None;
                }
                let Some(oldest) = self.cache.oldest() else {
                    self.has_more = false;
                    return None;
                };
                let query = HistoryQuery::older_than(oldest, self.page_size);
                self.phase = LoadPhase::LoadingOlder;
                self.issue(PageKind::Older, query)
            }
            ChatAction::OlderPageLoaded { request, messages } => {
                if !self.is_current(&request) || self.phase != LoadPhase::LoadingOlder {
                    tracing::debug!(seq = request.seq, "discarding stale older page");
                    return None;
                }
                self.settle(&request);
                self.has_more = messages.len() >= request.limit() as usize;
                if self.cache.push_older_page(messages) > 0 {
                    self.last_change = Change::Prepended;
                }
                self.become_ready()
            }
            ChatAction::Reconnected => match self.phase {
                LoadPhase::Idle => None,
                LoadPhase::Ready => {
                    self.resync_owed = false;
                    self.issue(PageKind::Resync, HistoryQuery::latest(self.page_size))
                }
                LoadPhase::LoadingFirst | LoadPhase::LoadingOlder | LoadPhase::Error { .. } => {
                    self.resync_owed = true;
                    None
                }
            },
            ChatAction::ResyncLoaded { request, messages } => {
                if !self.is_current(&request) {
                    return None;
                }
                self.settle(&request);
                let full_page = messages.len() >= request.limit() as usize;
                if full_page && !self.cache.overlaps(&messages) {
                    // Missed more than a page while disconnected; older history is refetched on demand.
                    self.cache.replace_with(messages);
                    self.has_more = true;
                    self.last_change = Change::Reset;
                } else if self.cache.merge_latest(messages) > 0 {
                    self.last_change = Change::Appended;
                }
                None
            }
            ChatAction::LoadFailed { request, error } => {
                if !self.is_current(&request) {
                    return None;
                }
                self.settle(&request);
                match request.kind {
                    PageKind::Resync => {
                        tracing::warn!(%error, "resync after reconnect failed");
                    }
                    PageKind::First | PageKind::Older => {
                        self.phase = LoadPhase::Error {
                            message: error,
                            failed: request,
                        };
                    }
                }
                None
            }
            ChatAction::Retry => {
                let LoadPhase::Error { failed, .. } = &self.phase else {
                    return None;
                };
                let (kind, query) = (failed.kind, failed.query.clone());
                self.phase = match kind {
                    PageKind::Older => LoadPhase::LoadingOlder,
                    PageKind::First | PageKind::Resync => LoadPhase::LoadingFirst,
                };
                self.issue(kind, query)
            }
            ChatAction::OptimisticSend { message } => {
                if self.belongs_here(&message) && self.cache.append(CachedMessage::pending(message))
                {
                    self.last_change = Change::Appended;
                }
                None
            }
            ChatAction::SendConfirmed { message } => {
                if self.belongs_here(&message) {
                    let known = self.cache.contains(message.id);
                    self.cache.confirm(message);
                    self.last_change = if known {
                        Change::Updated
                    } else {
                        Change::Appended
                    };
                }
                None
            }
            ChatAction::SendFailed { message_id, reason } => {
                if self.cache.mark_failed(message_id, reason) {
                    self.last_change = Change::Updated;
                }
                None
            }
            ChatAction::Resend { message_id } => {
                if self.cache.mark_pending(message_id) {
                    self.last_change = Change::Updated;
                }
                None
            }
            ChatAction::Pushed { message } => {
                if !self.belongs_here(&message) || message.sender.id == self.local_user {
                    return None;
                }
                if self.cache.append(CachedMessage::sent(message)) {
                    self.last_change = Change::Appended;
                }
                None
            }
        }
    }

    /// Local sends that have not been confirmed yet.
    #[must_use]
    pub fn unconfirmed(&self) -> Vec<&CachedMessage> {
        self.cache
            .iter()
            .filter(|entry| entry.status == DeliveryStatus::Pending)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, SenderProfile, Timestamp};
    use chrono::{Duration, TimeZone, Utc};

    struct Fixture {
        me: Uuid,
        peer: Uuid,
        conversation: Uuid,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                me: Uuid::new_v4(),
                peer: Uuid::new_v4(),
                conversation: Uuid::new_v4(),
            }
        }

        fn message(&self, sender: Uuid, minute: i64, content: &str) -> MessageView {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            MessageView {
                id: Uuid::new_v4(),
                conversation_id: self.conversation,
                sender: SenderProfile {
                    id: sender,
                    display_name: "someone".into(),
                    avatar_url: None,
                },
                kind: MessageKind::Text,
                content: content.into(),
                created_at: Timestamp(base + Duration::minutes(minute)),
            }
        }

        fn history(&self, range: std::ops::Range<i64>) -> Vec<MessageView> {
            range
                .map(|minute| self.message(self.peer, minute, &format!("m{minute}")))
                .collect()
        }

        fn ready_state(&self, first_page: Vec<MessageView>, page_size: u32) -> ChatState {
            let mut state = ChatState::new(self.me, page_size);
            let request = state
                .apply(ChatAction::Open {
                    conversation_id: self.conversation,
                })
                .unwrap();
            state.apply(ChatAction::FirstPageLoaded {
                request,
                messages: first_page,
            });
            state
        }
    }

    fn contents(state: &ChatState) -> Vec<String> {
        state
            .messages()
            .into_iter()
            .map(|entry| entry.message.content)
            .collect()
    }

    #[test]
    fn open_issues_first_page_request() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        let request = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();

        assert_eq!(request.kind, PageKind::First);
        assert_eq!(request.query, HistoryQuery::latest(30));
        assert_eq!(state.phase(), &LoadPhase::LoadingFirst);
        assert_eq!(state.pending_request(), Some(&request));
    }

    #[test]
    fn request_maps_results_to_matching_actions() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..30), 30);
        let older = state.apply(ChatAction::OlderRequested).unwrap();

        assert!(matches!(
            older.clone().loaded(Vec::new()),
            ChatAction::OlderPageLoaded { .. }
        ));
        assert!(matches!(
            older.failed("boom"),
            ChatAction::LoadFailed { error, .. } if error == "boom"
        ));
    }

    #[test]
    fn short_first_page_means_no_more_history() {
        let fx = Fixture::new();
        let state = fx.ready_state(fx.history(0..5), 30);

        assert_eq!(state.phase(), &LoadPhase::Ready);
        assert!(!state.has_more());
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn older_pages_prepend_in_order() {
        let fx = Fixture::new();
        let all = fx.history(0..35);
        let mut state = fx.ready_state(all[5..].to_vec(), 30);
        assert!(state.has_more());

        let request = state.apply(ChatAction::OlderRequested).unwrap();
        assert_eq!(request.kind, PageKind::Older);
        assert_eq!(request.query.before, Some(all[5].created_at));
        assert_eq!(state.phase(), &LoadPhase::LoadingOlder);

        state.apply(ChatAction::OlderPageLoaded {
            request,
            messages: all[..5].to_vec(),
        });

        assert_eq!(state.last_change(), Change::Prepended);
        assert!(!state.has_more());
        let expected: Vec<String> = (0..35).map(|m| format!("m{m}")).collect();
        assert_eq!(contents(&state), expected);
    }

    #[test]
    fn older_request_is_not_reentrant() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..30), 30);

        assert!(state.apply(ChatAction::OlderRequested).is_some());
        assert!(state.apply(ChatAction::OlderRequested).is_none());
        assert_eq!(state.phase(), &LoadPhase::LoadingOlder);
    }

    #[test]
    fn older_request_needs_more_history() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..3), 30);
        assert!(state.apply(ChatAction::OlderRequested).is_none());
        assert_eq!(state.phase(), &LoadPhase::Ready);
    }

    #[test]
    fn switching_conversation_discards_in_flight_pages() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..30), 30);
        let stale = state.apply(ChatAction::OlderRequested).unwrap();

        let other = Uuid::new_v4();
        let fresh = state
            .apply(ChatAction::Open {
                conversation_id: other,
            })
            .unwrap();
        assert!(fresh.epoch > stale.epoch);

        state.apply(ChatAction::OlderPageLoaded {
            request: stale,
            messages: fx.history(100..110),
        });
        assert!(state.messages().is_empty());
        assert_eq!(state.phase(), &LoadPhase::LoadingFirst);
    }

    #[test]
    fn reopening_same_conversation_invalidates_old_requests() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        let first = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();
        let second = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();

        state.apply(ChatAction::FirstPageLoaded {
            request: first,
            messages: fx.history(0..2),
        });
        assert_eq!(state.phase(), &LoadPhase::LoadingFirst);

        state.apply(ChatAction::FirstPageLoaded {
            request: second,
            messages: fx.history(0..2),
        });
        assert_eq!(state.phase(), &LoadPhase::Ready);
        assert_eq!(state.messages().len(), 2);
    }

    #[test]
    fn failed_load_enters_error_and_retry_reissues() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        let request = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();

        state.apply(ChatAction::LoadFailed {
            request: request.clone(),
            error: "timeout".into(),
        });
        assert!(matches!(state.phase(), LoadPhase::Error { message, .. } if message == "timeout"));

        let retry = state.apply(ChatAction::Retry).unwrap();
        assert_eq!(retry.kind, PageKind::First);
        assert_eq!(retry.query, request.query);
        assert!(retry.seq > request.seq);
        assert_eq!(state.phase(), &LoadPhase::LoadingFirst);
    }

    #[test]
    fn failed_older_page_retries_as_older() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..30), 30);
        let request = state.apply(ChatAction::OlderRequested).unwrap();
        state.apply(ChatAction::LoadFailed {
            request,
            error: "503".into(),
        });

        let retry = state.apply(ChatAction::Retry).unwrap();
        assert_eq!(retry.kind, PageKind::Older);
        assert_eq!(state.phase(), &LoadPhase::LoadingOlder);
        assert_eq!(state.messages().len(), 30);
    }

    #[test]
    fn self_echo_is_ignored_and_hello_appears_once() {
        let fx = Fixture::new();
        let mut sender = fx.ready_state(Vec::new(), 30);
        let mut receiver_state = ChatState::new(fx.peer, 30);
        let request = receiver_state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();
        receiver_state.apply(ChatAction::FirstPageLoaded {
            request,
            messages: Vec::new(),
        });

        let hello = fx.message(fx.me, 1, "hello");
        sender.apply(ChatAction::OptimisticSend {
            message: hello.clone(),
        });
        sender.apply(ChatAction::Pushed {
            message: hello.clone(),
        });
        sender.apply(ChatAction::SendConfirmed {
            message: hello.clone(),
        });
        receiver_state.apply(ChatAction::Pushed {
            message: hello.clone(),
        });
        receiver_state.apply(ChatAction::Pushed { message: hello });

        assert_eq!(contents(&sender), ["hello"]);
        assert_eq!(sender.messages()[0].status, DeliveryStatus::Sent);
        assert_eq!(contents(&receiver_state), ["hello"]);
    }

    #[test]
    fn pushes_for_other_conversations_are_ignored() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(Vec::new(), 30);
        let mut elsewhere = fx.message(fx.peer, 1, "elsewhere");
        elsewhere.conversation_id = Uuid::new_v4();

        state.apply(ChatAction::Pushed { message: elsewhere });
        assert!(state.messages().is_empty());
        assert_eq!(state.last_change(), Change::None);
    }

    #[test]
    fn push_dedupes_against_history() {
        let fx = Fixture::new();
        let history = fx.history(0..3);
        let mut state = fx.ready_state(history.clone(), 30);

        state.apply(ChatAction::Pushed {
            message: history[2].clone(),
        });
        assert_eq!(state.messages().len(), 3);
        assert_eq!(state.last_change(), Change::None);
    }

    #[test]
    fn failed_send_stays_visible_as_failed() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(Vec::new(), 30);
        let draft = fx.message(fx.me, 1, "draft");

        state.apply(ChatAction::OptimisticSend {
            message: draft.clone(),
        });
        assert_eq!(state.unconfirmed().len(), 1);
        state.apply(ChatAction::SendFailed {
            message_id: draft.id,
            reason: "send_failed".into(),
        });

        let entries = state.messages();
        assert_eq!(entries.len(), 1);
        assert!(matches!(entries[0].status, DeliveryStatus::Failed { .. }));
        assert!(state.unconfirmed().is_empty());
    }

    #[test]
    fn resend_only_revives_failed_entries() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..1), 30);
        let draft = fx.message(fx.me, 1, "draft");

        state.apply(ChatAction::OptimisticSend {
            message: draft.clone(),
        });
        state.apply(ChatAction::Resend {
            message_id: draft.id,
        });
        assert_eq!(state.last_change(), Change::None);

        state.apply(ChatAction::SendFailed {
            message_id: draft.id,
            reason: "offline".into(),
        });
        state.apply(ChatAction::Resend {
            message_id: draft.id,
        });
        assert_eq!(state.last_change(), Change::Updated);
        assert_eq!(state.unconfirmed().len(), 1);

        let delivered = state.messages()[0].id();
        state.apply(ChatAction::Resend {
            message_id: delivered,
        });
        assert_eq!(state.last_change(), Change::None);
    }

    #[test]
    fn resync_merges_missed_messages() {
        let fx = Fixture::new();
        let history = fx.history(0..5);
        let mut state = fx.ready_state(history[..3].to_vec(), 30);

        let request = state.apply(ChatAction::Reconnected).unwrap();
        assert_eq!(request.kind, PageKind::Resync);
        state.apply(ChatAction::ResyncLoaded {
            request,
            messages: history.clone(),
        });

        assert_eq!(state.last_change(), Change::Appended);
        assert_eq!(contents(&state), ["m0", "m1", "m2", "m3", "m4"]);
    }

    #[test]
    fn resync_with_gap_replaces_history() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..3), 3);
        assert!(state.has_more());

        let request = state.apply(ChatAction::Reconnected).unwrap();
        state.apply(ChatAction::ResyncLoaded {
            request,
            messages: fx.history(10..13),
        });

        assert_eq!(state.last_change(), Change::Reset);
        assert_eq!(contents(&state), ["m10", "m11", "m12"]);
        assert!(state.has_more());
    }

    #[test]
    fn failed_resync_keeps_ready_state() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..3), 30);
        let request = state.apply(ChatAction::Reconnected).unwrap();
        state.apply(ChatAction::LoadFailed {
            request,
            error: "offline".into(),
        });
        assert_eq!(state.phase(), &LoadPhase::Ready);
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn join_during_older_load_resyncs_once_ready() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(10..40), 30);
        let older = state.apply(ChatAction::OlderRequested).unwrap();

        assert_eq!(state.apply(ChatAction::Reconnected), None);
        let resync = state
            .apply(ChatAction::OlderPageLoaded {
                request: older,
                messages: fx.history(0..10),
            })
            .unwrap();

        assert_eq!(resync.kind, PageKind::Resync);
        assert_eq!(resync.query, HistoryQuery::latest(30));
        assert_eq!(state.phase(), &LoadPhase::Ready);
        assert_eq!(state.pending_request(), Some(&resync));
    }

    #[test]
    fn join_acknowledged_before_first_page_resyncs_after_it() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        let first = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();

        assert_eq!(state.apply(ChatAction::Reconnected), None);
        let first_page = fx.history(0..3);
        let resync = state
            .apply(ChatAction::FirstPageLoaded {
                request: first,
                messages: first_page.clone(),
            })
            .unwrap();
        assert_eq!(resync.kind, PageKind::Resync);

        // A message sent between the first page query and the join.
        let mut missed = first_page;
        missed.push(fx.message(fx.peer, 5, "missed"));
        state.apply(resync.loaded(missed));
        assert_eq!(contents(&state), ["m0", "m1", "m2", "missed"]);
        assert!(state.pending_request().is_none());
    }

    #[test]
    fn join_after_first_page_resyncs_immediately() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..3), 30);
        let resync = state.apply(ChatAction::Reconnected).unwrap();
        assert_eq!(resync.kind, PageKind::Resync);
    }

    #[test]
    fn owed_resync_survives_failed_load_and_retry() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        let first = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();
        state.apply(first.failed("timeout"));
        assert_eq!(state.apply(ChatAction::Reconnected), None);

        let retry = state.apply(ChatAction::Retry).unwrap();
        let resync = state.apply(retry.loaded(fx.history(0..2))).unwrap();
        assert_eq!(resync.kind, PageKind::Resync);
    }

    #[test]
    fn join_before_open_or_after_close_is_ignored() {
        let fx = Fixture::new();
        let mut state = ChatState::new(fx.me, 30);
        assert_eq!(state.apply(ChatAction::Reconnected), None);

        let first = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();
        state.apply(ChatAction::Reconnected);
        state.apply(ChatAction::Close);
        let reopened = state
            .apply(ChatAction::Open {
                conversation_id: fx.conversation,
            })
            .unwrap();
        assert!(reopened.seq > first.seq);
        assert_eq!(state.apply(reopened.loaded(fx.history(0..2))), None);
    }

    #[test]
    fn close_returns_to_idle() {
        let fx = Fixture::new();
        let mut state = fx.ready_state(fx.history(0..3), 30);
        state.apply(ChatAction::Close);
        assert_eq!(state.phase(), &LoadPhase::Idle);
        assert!(state.messages().is_empty());
        assert_eq!(state.conversation_id(), None);
    }
}
