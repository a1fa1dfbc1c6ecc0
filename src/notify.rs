// Background refreshes for a mounted dashboard: new-notification polling
// (15s, bridged into a per-session notice queue), unread notification count
// (30s) and unread message count (10s). The three timers are independent and
// additive; all die with the session.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, interval};

use crate::api_client::{ApiClient, ApiError, MarketApi};

const NEW_NOTIFICATION_POLL_SECS: u64 = 15;
const UNREAD_NOTIFICATION_POLL_SECS: u64 = 30;
const UNREAD_MESSAGE_POLL_SECS: u64 = 10;

/// Keep at most this many undelivered notices per session.
const NOTICE_CAP: usize = 50;

/// A notice waiting to be shown by the page. The tag mirrors the browser
/// Notification tag semantics: re-delivery of the same tag replaces the
/// earlier notice instead of stacking a duplicate.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Notice {
    pub tag: String,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct NoticeBoard {
    inner: Mutex<VecDeque<Notice>>,
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notice: Notice) {
        let mut q = self.inner.lock().unwrap();
        q.retain(|n| n.tag != notice.tag);
        q.push_back(notice);
        while q.len() > NOTICE_CAP {
            q.pop_front();
        }
    }

    /// Hands all pending notices to the page and clears the queue.
    pub fn drain(&self) -> Vec<Notice> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }
}

#[derive(Default)]
pub struct UnreadCounts {
    notifications: AtomicI64,
    messages: AtomicI64,
}

impl UnreadCounts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> i64 {
        self.notifications.load(Ordering::Relaxed)
    }

    pub fn messages(&self) -> i64 {
        self.messages.load(Ordering::Relaxed)
    }
}

/// One poll step: fetch notifications newer than the watermark, queue them,
/// then advance the watermark to "now" whether or not anything was found, so
/// the same items are never delivered twice. A failed poll leaves the
/// watermark alone.
pub(crate) async fn poll_new<C: MarketApi>(
    api: &C,
    token: &str,
    user_id: i64,
    last_checked: &mut DateTime<Utc>,
    board: &NoticeBoard,
) -> Result<usize, ApiError> {
    let items = api.notifications_since(token, user_id, *last_checked).await?;
    let count = items.len();
    for n in items {
        board.push(Notice {
            tag: format!("notification-{}", n.id),
            title: n.title,
            body: n.message,
            link: n.link,
            created_at: n.created_at,
        });
    }
    *last_checked = Utc::now();
    Ok(count)
}

/// Owns the session's timer tasks. Dropped with the session, which aborts
/// everything still running.
pub struct Pollers {
    background: Vec<JoinHandle<()>>,
    notifier: Option<JoinHandle<()>>,
}

impl Pollers {
    /// Starts the two count refreshes. The new-notification poller is
    /// managed separately via `set_notifications_enabled` because it depends
    /// on the page-side permission grant.
    pub fn start(
        api: Arc<ApiClient>,
        token: String,
        user_id: i64,
        counts: Arc<UnreadCounts>,
    ) -> Self {
        let mut background = Vec::new();

        {
            let (api, token, counts) = (api.clone(), token.clone(), counts.clone());
            background.push(tokio::spawn(async move {
                let mut tick = interval(Duration::from_secs(UNREAD_NOTIFICATION_POLL_SECS));
                loop {
                    tick.tick().await;
                    match api.unread_notification_count(&token, user_id).await {
                        Ok(count) => counts.notifications.store(count, Ordering::Relaxed),
                        Err(e) => tracing::debug!("Unread notification poll failed: {}", e),
                    }
                }
            }));
        }

        {
            background.push(tokio::spawn(async move {
                let mut tick = interval(Duration::from_secs(UNREAD_MESSAGE_POLL_SECS));
                loop {
                    tick.tick().await;
                    match api.unread_message_count(&token).await {
                        Ok(count) => counts.messages.store(count, Ordering::Relaxed),
                        Err(e) => tracing::debug!("Unread message poll failed: {}", e),
                    }
                }
            }));
        }

        Self {
            background,
            notifier: None,
        }
    }

    /// Grants or revokes the new-notification poller. Revocation is the only
    /// cancellation path; there is no pause/resume.
    pub fn set_notifications_enabled(
        &mut self,
        enabled: bool,
        api: Arc<ApiClient>,
        token: String,
        user_id: i64,
        board: Arc<NoticeBoard>,
    ) {
        if !enabled {
            if let Some(handle) = self.notifier.take() {
                tracing::info!("Tearing down notification poller for user {}", user_id);
                handle.abort();
            }
            return;
        }
        if self.notifier.is_some() {
            return;
        }
        tracing::info!("Starting notification poller for user {}", user_id);
        self.notifier = Some(tokio::spawn(async move {
            let mut last_checked = Utc::now();
            // The first tick of a tokio interval completes immediately, so
            // the first check does not wait out the interval.
            let mut tick = interval(Duration::from_secs(NEW_NOTIFICATION_POLL_SECS));
            loop {
                tick.tick().await;
                match poll_new(&*api, &token, user_id, &mut last_checked, &board).await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Queued {} new notifications", n),
                    Err(e) => tracing::debug!("Notification poll failed: {}", e),
                }
            }
        }));
    }

}

impl Drop for Pollers {
    fn drop(&mut self) {
        for handle in &self.background {
            handle.abort();
        }
        if let Some(handle) = &self.notifier {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::mocks::{sample_notification, MockApi};
    use chrono::Duration as ChronoDuration;

    fn notice(tag: &str, body: &str) -> Notice {
        Notice {
            tag: tag.to_string(),
            title: "t".to_string(),
            body: body.to_string(),
            link: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn same_tag_coalesces_instead_of_stacking() {
        let board = NoticeBoard::new();
        board.push(notice("notification-1", "first"));
        board.push(notice("notification-2", "other"));
        board.push(notice("notification-1", "updated"));
        let drained = board.drain();
        assert_eq!(drained.len(), 2);
        let updated = drained.iter().find(|n| n.tag == "notification-1").unwrap();
        assert_eq!(updated.body, "updated");
        assert!(board.is_empty());
    }

    #[test]
    fn queue_is_capped_keeping_newest() {
        let board = NoticeBoard::new();
        for i in 0..(NOTICE_CAP + 10) {
            board.push(notice(&format!("notification-{}", i), "x"));
        }
        let drained = board.drain();
        assert_eq!(drained.len(), NOTICE_CAP);
        assert_eq!(drained.last().unwrap().tag, format!("notification-{}", NOTICE_CAP + 9));
    }

    #[tokio::test]
    async fn watermark_advances_even_when_nothing_is_new() {
        let mock = MockApi::new();
        let board = NoticeBoard::new();
        let mut last = Utc::now() - ChronoDuration::minutes(10);
        let before = last;
        let found = poll_new(&mock, "t", 1, &mut last, &board).await.unwrap();
        assert_eq!(found, 0);
        assert!(last > before, "successful empty poll must advance the watermark");
    }

    #[tokio::test]
    async fn failed_poll_leaves_watermark_alone() {
        let mock = MockApi::new().failing_notifications();
        let board = NoticeBoard::new();
        let mut last = Utc::now() - ChronoDuration::minutes(10);
        let before = last;
        assert!(poll_new(&mock, "t", 1, &mut last, &board).await.is_err());
        assert_eq!(last, before);
    }

    #[tokio::test]
    async fn new_items_become_tagged_notices() {
        let mock = MockApi::new()
            .with_notifications(vec![sample_notification(11), sample_notification(12)]);
        let board = NoticeBoard::new();
        let mut last = Utc::now() - ChronoDuration::minutes(10);
        let found = poll_new(&mock, "t", 1, &mut last, &board).await.unwrap();
        assert_eq!(found, 2);
        let tags: Vec<String> = board.drain().into_iter().map(|n| n.tag).collect();
        assert_eq!(tags, vec!["notification-11", "notification-12"]);
    }
}
