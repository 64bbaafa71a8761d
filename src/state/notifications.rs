//! Notification feed reconciler.
//!
//! Read-state changes are optimistic: the feed and the unread counter change
//! first and the session mirrors them to the server as fire-and-forget
//! socket events. The server's own `unread_count_updated` push always wins.

#[cfg(test)]
#[path = "notifications_test.rs"]
mod notifications_test;

use crate::net::types::{Notification, NotificationSnapshot};

#[derive(Clone, Debug, Default)]
pub struct NotificationFeed {
    items: Vec<Notification>,
    unread_count: u32,
}

impl NotificationFeed {
    /// Newest first.
    #[must_use]
    pub fn items(&self) -> &[Notification] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, notification_id: &str) -> Option<&Notification> {
        self.items.iter().find(|n| n.id == notification_id)
    }

    #[must_use]
    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    /// Items for the "unread" tab.
    #[must_use]
    pub fn unread(&self) -> Vec<&Notification> {
        self.items.iter().filter(|n| !n.is_read).collect()
    }

    /// Replace the feed with a fetched snapshot.
    pub fn load(&mut self, snapshot: NotificationSnapshot) {
        let mut seen = std::collections::HashSet::new();
        self.items = snapshot.notifications.into_iter().filter(|n| seen.insert(n.id.clone())).collect();
        self.unread_count = snapshot.unread_count;
    }

    /// Prepend a pushed notification. Returns `false` for an id already shown.
    pub fn apply_new(&mut self, notification: Notification) -> bool {
        if self.get(&notification.id).is_some() {
            tracing::debug!(notification_id = %notification.id, "duplicate notification push");
            return false;
        }
        if !notification.is_read {
            self.unread_count = self.unread_count.saturating_add(1);
        }
        self.items.insert(0, notification);
        true
    }

    pub fn set_unread_count(&mut self, count: u32) {
        self.unread_count = count;
    }

    /// Mark one notification read. Returns `true` when it was unread.
    pub fn mark_read(&mut self, notification_id: &str) -> bool {
        let Some(notification) = self.items.iter_mut().find(|n| n.id == notification_id) else {
            return false;
        };
        if notification.is_read {
            return false;
        }
        notification.is_read = true;
        self.unread_count = self.unread_count.saturating_sub(1);
        true
    }

    /// Mark everything read and zero the counter.
    pub fn mark_all_read(&mut self) {
        for notification in &mut self.items {
            notification.is_read = true;
        }
        self.unread_count = 0;
    }

    /// Remove a notification, adjusting the counter if it was unread.
    pub fn delete(&mut self, notification_id: &str) -> Option<Notification> {
        let index = self.items.iter().position(|n| n.id == notification_id)?;
        let removed = self.items.remove(index);
        if !removed.is_read {
            self.unread_count = self.unread_count.saturating_sub(1);
        }
        Some(removed)
    }
}
