use std::collections::HashSet;

use uuid::Uuid;

use crate::models::MessageView;

/// Delivery state of a cached entry. Only local sends are ever `Pending` or `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    /// Stored by the server.
    Sent,
    /// Sent locally, no answer yet.
    Pending,
    /// The send gave up; `reason` is shown next to the entry.
    Failed { reason: String },
}

/// A message as the client holds it, with its delivery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMessage {
    pub message: MessageView,
    pub status: DeliveryStatus,
}

impl CachedMessage {
    #[must_use]
    pub fn sent(message: MessageView) -> Self {
        Self {
            message,
            status: DeliveryStatus::Sent,
        }
    }

    #[must_use]
    pub fn pending(message: MessageView) -> Self {
        Self {
            message,
            status: DeliveryStatus::Pending,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.message.id
    }
}

/// Deduplicated message sequence for one conversation.
///
/// History is stored as pages in fetch order: `pages[0]` is the newest page and every page is
/// oldest to newest. Live messages are appended to the newest page. Display order is the page list
/// reversed and flattened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageCache {
    pages: Vec<Vec<CachedMessage>>,
    ids: HashSet<Uuid>,
}

impl MessageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn contains(&self, id: Uuid) -> bool {
        self.ids.contains(&id)
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn clear(&mut self) {
        self.pages.clear();
        self.ids.clear();
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&CachedMessage> {
        if !self.contains(id) {
            return None;
        }
        self.pages.iter().flatten().find(|entry| entry.id() == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut CachedMessage> {
        if !self.ids.contains(&id) {
            return None;
        }
        self.pages
            .iter_mut()
            .flatten()
            .find(|entry| entry.id() == id)
    }

    /// Oldest message confirmed by the server; the cursor for the next older page.
    #[must_use]
    pub fn oldest(&self) -> Option<&MessageView> {
        self.pages
            .iter()
            .rev()
            .flatten()
            .find(|entry| entry.status == DeliveryStatus::Sent)
            .map(|entry| &entry.message)
    }

    /// Entries oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &CachedMessage> {
        self.pages.iter().rev().flatten()
    }

    #[must_use]
    pub fn flatten(&self) -> Vec<CachedMessage> {
        self.iter().cloned().collect()
    }

    /// Adds `entry` to the end of the newest page. Returns false if the id is already cached.
    pub fn append(&mut self, entry: CachedMessage) -> bool {
        if !self.ids.insert(entry.id()) {
            return false;
        }
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        self.pages[0].push(entry);
        true
    }

    /// Adds a page older than everything cached. Returns how many messages were new.
    pub fn push_older_page(&mut self, page: Vec<MessageView>) -> usize {
        let fresh = self.dedupe(page);
        let inserted = fresh.len();
        if inserted > 0 {
            self.pages.push(fresh);
        }
        inserted
    }

    /// Merges a freshly fetched newest page with whatever live entries are already cached.
    ///
    /// Unknown messages are added to the newest page, which is then re-sorted by server order
    /// with unconfirmed local sends kept last. Returns how many messages were new.
    pub fn merge_latest(&mut self, page: Vec<MessageView>) -> usize {
        let fresh = self.dedupe(page);
        let inserted = fresh.len();
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }

        let newest = &mut self.pages[0];
        newest.extend(fresh);
        newest.sort_by(|a, b| {
            let a_local = a.status != DeliveryStatus::Sent;
            let b_local = b.status != DeliveryStatus::Sent;
            a_local
                .cmp(&b_local)
                .then_with(|| a.message.order_key().cmp(&b.message.order_key()))
        });
        inserted
    }

    /// Drops everything except unconfirmed local sends and starts over from `page`.
    pub fn replace_with(&mut self, page: Vec<MessageView>) {
        let local: Vec<CachedMessage> = self
            .iter()
            .filter(|entry| entry.status != DeliveryStatus::Sent)
            .cloned()
            .collect();
        self.clear();
        self.merge_latest(page);
        for entry in local {
            self.append(entry);
        }
    }

    /// Whether any of `page` is already cached.
    #[must_use]
    pub fn overlaps(&self, page: &[MessageView]) -> bool {
        page.iter().any(|message| self.contains(message.id))
    }

    /// Marks a local send as stored, taking the server's copy of the message.
    /// Appends it when the optimistic entry is unknown.
    pub fn confirm(&mut self, message: MessageView) {
        if let Some(entry) = self.get_mut(message.id) {
            entry.message = message;
            entry.status = DeliveryStatus::Sent;
        } else {
            self.append(CachedMessage::sent(message));
        }
    }

    /// Returns false when no unconfirmed entry has this id.
    pub fn mark_failed(&mut self, id: Uuid, reason: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(entry) if entry.status != DeliveryStatus::Sent => {
                entry.status = DeliveryStatus::Failed {
                    reason: reason.into(),
                };
                true
            }
            _ => false,
        }
    }

    /// Puts a failed local send back to pending. Returns false for any other entry.
    pub fn mark_pending(&mut self, id: Uuid) -> bool {
        match self.get_mut(id) {
            Some(entry) if matches!(entry.status, DeliveryStatus::Failed { .. }) => {
                entry.status = DeliveryStatus::Pending;
                true
            }
            _ => false,
        }
    }

    fn dedupe(&mut self, page: Vec<MessageView>) -> Vec<CachedMessage> {
        page.into_iter()
            .filter(|message| self.ids.insert(message.id))
            .map(CachedMessage::sent)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageKind, SenderProfile, Timestamp};
    use chrono::{Duration, TimeZone, Utc};

    fn message(conversation_id: Uuid, minute: i64, content: &str) -> MessageView {
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        MessageView {
            id: Uuid::new_v4(),
            conversation_id,
            sender: SenderProfile::unknown(Uuid::nil()),
            kind: MessageKind::Text,
            content: content.into(),
            created_at: Timestamp(base + Duration::minutes(minute)),
        }
    }

    fn contents(cache: &MessageCache) -> Vec<String> {
        cache.iter().map(|e| e.message.content.clone()).collect()
    }

    #[test]
    fn flattens_pages_oldest_first() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        cache.merge_latest(vec![message(conversation, 3, "c"), message(conversation, 4, "d")]);
        cache.push_older_page(vec![message(conversation, 1, "a"), message(conversation, 2, "b")]);

        assert_eq!(contents(&cache), ["a", "b", "c", "d"]);
        assert_eq!(cache.page_count(), 2);
        assert_eq!(cache.oldest().unwrap().content, "a");
    }

    #[test]
    fn append_ignores_known_ids() {
        let conversation = Uuid::new_v4();
        let hello = message(conversation, 1, "hello");
        let mut cache = MessageCache::new();

        assert!(cache.append(CachedMessage::pending(hello.clone())));
        assert!(!cache.append(CachedMessage::sent(hello.clone())));
        cache.merge_latest(vec![hello]);

        assert_eq!(cache.len(), 1);
        assert_eq!(contents(&cache), ["hello"]);
    }

    #[test]
    fn appends_go_to_newest_page() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        cache.merge_latest(vec![message(conversation, 2, "b")]);
        cache.push_older_page(vec![message(conversation, 1, "a")]);
        cache.append(CachedMessage::sent(message(conversation, 3, "c")));

        assert_eq!(contents(&cache), ["a", "b", "c"]);
    }

    #[test]
    fn older_page_overlap_is_skipped() {
        let conversation = Uuid::new_v4();
        let shared = message(conversation, 2, "b");
        let mut cache = MessageCache::new();
        cache.merge_latest(vec![shared.clone(), message(conversation, 3, "c")]);

        let inserted = cache.push_older_page(vec![message(conversation, 1, "a"), shared]);
        assert_eq!(inserted, 1);
        assert_eq!(contents(&cache), ["a", "b", "c"]);
    }

    #[test]
    fn merge_latest_keeps_local_sends_last() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        let mine = message(conversation, 0, "mine");
        cache.append(CachedMessage::pending(mine.clone()));
        cache.merge_latest(vec![message(conversation, 1, "x"), message(conversation, 2, "y")]);

        assert_eq!(contents(&cache), ["x", "y", "mine"]);
        assert_eq!(cache.get(mine.id).unwrap().status, DeliveryStatus::Pending);
    }

    #[test]
    fn confirm_replaces_optimistic_copy() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        let optimistic = message(conversation, 0, "hi");
        cache.append(CachedMessage::pending(optimistic.clone()));

        let mut stored = optimistic.clone();
        stored.created_at = Timestamp(stored.created_at.0 + Duration::seconds(2));
        cache.confirm(stored.clone());

        let entry = cache.get(optimistic.id).unwrap();
        assert_eq!(entry.status, DeliveryStatus::Sent);
        assert_eq!(entry.message, stored);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn mark_failed_only_touches_unconfirmed() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        let pending = message(conversation, 0, "pending");
        let sent = message(conversation, 1, "sent");
        cache.append(CachedMessage::pending(pending.clone()));
        cache.append(CachedMessage::sent(sent.clone()));

        assert!(cache.mark_failed(pending.id, "offline"));
        assert!(!cache.mark_failed(sent.id, "offline"));
        assert!(!cache.mark_failed(Uuid::new_v4(), "offline"));
        assert_eq!(
            cache.get(pending.id).unwrap().status,
            DeliveryStatus::Failed {
                reason: "offline".into()
            }
        );
    }

    #[test]
    fn replace_with_keeps_unconfirmed_sends() {
        let conversation = Uuid::new_v4();
        let mut cache = MessageCache::new();
        cache.merge_latest(vec![message(conversation, 1, "stale")]);
        cache.append(CachedMessage::pending(message(conversation, 2, "draft")));

        cache.replace_with(vec![message(conversation, 50, "fresh")]);
        assert_eq!(contents(&cache), ["fresh", "draft"]);
        assert_eq!(cache.page_count(), 1);
    }
}
