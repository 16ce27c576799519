//! Live user updates.
//!
//! Every committed write to the user row is pushed to all subscribers in
//! commit order. Reads for a new subscription and writes both run under the
//! subscriber lock, so no write falls between a subscriber's first value and
//! its registration.

use crate::records::StoredUser;
use keeper_core::KeeperResult;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

#[derive(Debug)]
struct Subscriber {
    tx: Sender<StoredUser>,
    closed: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
pub(crate) struct UserFeed {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl UserFeed {
    /// Registers a subscriber whose first value is whatever `read` returns.
    pub(crate) fn subscribe(
        &self,
        read: impl FnOnce() -> KeeperResult<StoredUser>,
    ) -> KeeperResult<UserStream> {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|subscriber| !subscriber.closed.load(Ordering::Acquire));

        let current = read()?;
        let (tx, rx) = mpsc::channel();
        // The receiver is alive here, so this send cannot fail.
        let _ = tx.send(current);

        let closed = Arc::new(AtomicBool::new(false));
        subscribers.push(Subscriber {
            tx,
            closed: Arc::clone(&closed),
        });

        Ok(UserStream {
            receiver: rx,
            closed,
        })
    }

    /// Runs `write` and hands the committed user to every subscriber before
    /// another write can start.
    pub(crate) fn publish(
        &self,
        write: impl FnOnce() -> KeeperResult<StoredUser>,
    ) -> KeeperResult<()> {
        let mut subscribers = self.subscribers.write();
        let user = write()?;
        subscribers.retain(|subscriber| {
            !subscriber.closed.load(Ordering::Acquire) && subscriber.tx.send(user.clone()).is_ok()
        });
        Ok(())
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Blocking stream of user snapshots: the value at subscription time, then one
/// value per write. Ends when the store is dropped.
#[derive(Debug)]
pub struct UserStream {
    receiver: Receiver<StoredUser>,
    closed: Arc<AtomicBool>,
}

impl UserStream {
    pub fn next_timeout(&self, timeout: Duration) -> Option<StoredUser> {
        match self.receiver.recv_timeout(timeout) {
            Ok(user) => Some(user),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn try_next(&self) -> Option<StoredUser> {
        self.receiver.try_recv().ok()
    }
}

impl Drop for UserStream {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl Iterator for UserStream {
    type Item = StoredUser;

    fn next(&mut self) -> Option<Self::Item> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn alice() -> StoredUser {
        StoredUser {
            session: "tok".to_string(),
            user_name: "alice".to_string(),
            ..StoredUser::default()
        }
    }

    #[test]
    fn dropped_streams_are_pruned_on_publish() {
        let feed = UserFeed::default();
        let kept = feed.subscribe(|| Ok(StoredUser::default())).expect("kept");
        let dropped = feed.subscribe(|| Ok(StoredUser::default())).expect("dropped");
        assert_eq!(feed.subscriber_count(), 2);

        drop(dropped);
        feed.publish(|| Ok(alice())).expect("publish");

        assert_eq!(feed.subscriber_count(), 1);
        assert_eq!(kept.try_next(), Some(StoredUser::default()));
        assert_eq!(kept.try_next(), Some(alice()));
        assert_eq!(kept.try_next(), None);
    }

    #[test]
    fn snapshot_reads_without_writes_do_not_accumulate() {
        let feed = UserFeed::default();
        for _ in 0..1000 {
            let stream = feed.subscribe(|| Ok(StoredUser::default())).expect("stream");
            assert_eq!(stream.try_next(), Some(StoredUser::default()));
        }

        assert!(feed.subscriber_count() <= 1);
    }

    #[test]
    fn failed_write_is_not_published() {
        let feed = UserFeed::default();
        let stream = feed.subscribe(|| Ok(StoredUser::default())).expect("stream");
        assert_eq!(stream.try_next(), Some(StoredUser::default()));

        let result = feed.publish(|| Err(keeper_core::KeeperError::storage("disk full")));

        assert!(result.is_err());
        assert_eq!(stream.try_next(), None);
    }

    #[test]
    fn writes_wait_for_a_subscription_in_progress() {
        let feed = Arc::new(UserFeed::default());
        let row = Arc::new(Mutex::new(StoredUser::default()));
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let subscriber = {
            let feed = Arc::clone(&feed);
            let row = Arc::clone(&row);
            std::thread::spawn(move || {
                feed.subscribe(|| {
                    let _ = entered_tx.send(());
                    let _ = release_rx.recv();
                    Ok(row.lock().expect("row").clone())
                })
                .expect("subscribe")
            })
        };

        entered_rx.recv().expect("subscriber reading");
        let writer = {
            let feed = Arc::clone(&feed);
            let row = Arc::clone(&row);
            std::thread::spawn(move || {
                feed.publish(|| {
                    *row.lock().expect("row") = alice();
                    Ok(alice())
                })
                .expect("publish")
            })
        };
        let _ = release_tx.send(());

        writer.join().expect("writer");
        let stream = subscriber.join().expect("subscriber");
        let mut seen = Vec::new();
        while let Some(user) = stream.try_next() {
            seen.push(user);
        }

        // Either the write landed before the read, or it was delivered after.
        assert_eq!(seen.last(), Some(&alice()));
    }
}
