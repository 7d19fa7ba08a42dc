//! Undo buffer for item deletion.
//!
//! Deleting an item removes it from the store straight away, but the irreversible
//! part (releasing its image) is deferred for a grace period. Until then the deletion
//! can be undone, which re-inserts the exact snapshot under the same id.
//!
//! One deletion is live at a time. Deleting another item while a grace window is
//! open finalizes the earlier deletion immediately: its timer is cancelled, its image
//! released, and its handle stops being undoable.

use crate::{
    collaborators::{Clock, ImageStore},
    core::item::get_item,
    entities::{Item, item},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{sync::Mutex, task::JoinHandle};
use tracing::{debug, info, warn};

/// How long a deletion stays undoable unless configured otherwise.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Identifies one deletion for a later undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeletionHandle(u64);

impl DeletionHandle {
    /// Numeric value of the handle.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

struct PendingDeletion {
    handle: DeletionHandle,
    snapshot: item::Model,
    deadline: DateTime<Utc>,
    eviction: JoinHandle<()>,
}

type Slot = Arc<Mutex<Option<PendingDeletion>>>;

/// Reversible delete with a timed grace window.
#[derive(Clone)]
pub struct UndoBuffer {
    db: DatabaseConnection,
    images: Arc<dyn ImageStore>,
    clock: Arc<dyn Clock>,
    grace_period: Duration,
    slot: Slot,
    next_handle: Arc<AtomicU64>,
}

fn evict(images: &dyn ImageStore, handle: DeletionHandle, snapshot: &item::Model) {
    if let Some(image_ref) = snapshot.image_ref.as_deref() {
        if let Err(e) = images.release(image_ref) {
            warn!(item_id = snapshot.id, image_ref, error = %e, "Failed to release image");
        }
    }
    info!(
        handle = handle.id(),
        item_id = snapshot.id,
        "Deletion finalized"
    );
}

async fn run_eviction(
    slot: Slot,
    images: Arc<dyn ImageStore>,
    handle: DeletionHandle,
    grace_period: Duration,
) {
    tokio::time::sleep(grace_period).await;

    let mut slot = slot.lock().await;
    if let Some(pending) = slot.take_if(|pending| pending.handle == handle) {
        evict(images.as_ref(), pending.handle, &pending.snapshot);
    }
}

async fn restore_snapshot(db: &DatabaseConnection, snapshot: &item::Model) -> Result<item::Model> {
    let snapshot = snapshot.clone();
    let restored = item::ActiveModel {
        id: Set(snapshot.id),
        title: Set(snapshot.title),
        price_cents: Set(snapshot.price_cents),
        notes: Set(snapshot.notes),
        product_url: Set(snapshot.product_url),
        tags: Set(snapshot.tags),
        image_ref: Set(snapshot.image_ref),
        created_at: Set(snapshot.created_at),
        month_key: Set(snapshot.month_key),
        status: Set(snapshot.status),
    };
    restored.insert(db).await.map_err(Into::into)
}

impl UndoBuffer {
    /// Creates a buffer that keeps deletions undoable for `grace_period`.
    #[must_use]
    pub fn new(
        db: DatabaseConnection,
        images: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
        grace_period: Duration,
    ) -> Self {
        Self {
            db,
            images,
            clock,
            grace_period,
            slot: Arc::new(Mutex::new(None)),
            next_handle: Arc::new(AtomicU64::new(1)),
        }
    }

    /// The configured grace period.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Removes an item and returns a handle that can undo the removal until the
    /// grace period elapses.
    ///
    /// Any deletion still in its grace window is finalized first.
    pub async fn delete(&self, item_id: i64) -> Result<DeletionHandle> {
        let mut slot = self.slot.lock().await;

        let txn = self.db.begin().await?;
        let snapshot = get_item(&txn, item_id)
            .await?
            .ok_or(Error::ItemNotFound { id: item_id })?;
        Item::delete_by_id(item_id).exec(&txn).await?;
        txn.commit().await?;

        if let Some(previous) = slot.take() {
            previous.eviction.abort();
            debug!(
                handle = previous.handle.id(),
                "New deletion replaces pending one; finalizing early"
            );
            evict(self.images.as_ref(), previous.handle, &previous.snapshot);
        }

        let handle = DeletionHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        let grace = chrono::Duration::from_std(self.grace_period).unwrap_or(chrono::Duration::MAX);
        let deadline = self
            .clock
            .now()
            .checked_add_signed(grace)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        let eviction = tokio::spawn(run_eviction(
            Arc::clone(&self.slot),
            Arc::clone(&self.images),
            handle,
            self.grace_period,
        ));

        info!(handle = handle.id(), item_id, %deadline, "Item deleted; undo available");
        *slot = Some(PendingDeletion {
            handle,
            snapshot,
            deadline,
            eviction,
        });
        Ok(handle)
    }

    /// Restores a deleted item with its original id and every captured field.
    ///
    /// Fails with [`Error::Expired`] once the grace period has elapsed or the
    /// deletion was finalized by a newer one; the item stays deleted.
    pub async fn undo(&self, handle: DeletionHandle) -> Result<item::Model> {
        let mut slot = self.slot.lock().await;

        let Some(pending) = slot.take_if(|pending| pending.handle == handle) else {
            return Err(Error::Expired { handle: handle.id() });
        };

        if self.clock.now() >= pending.deadline {
            pending.eviction.abort();
            evict(self.images.as_ref(), pending.handle, &pending.snapshot);
            return Err(Error::Expired { handle: handle.id() });
        }

        match restore_snapshot(&self.db, &pending.snapshot).await {
            Ok(restored) => {
                pending.eviction.abort();
                info!(handle = handle.id(), item_id = restored.id, "Deletion undone");
                Ok(restored)
            }
            Err(e) => {
                // Keep the deletion pending so the caller may retry within the window
                *slot = Some(pending);
                Err(e)
            }
        }
    }

    /// Finalizes the pending deletion, if any, without waiting for its timer.
    pub async fn flush(&self) {
        let mut slot = self.slot.lock().await;
        if let Some(pending) = slot.take() {
            pending.eviction.abort();
            evict(self.images.as_ref(), pending.handle, &pending.snapshot);
        }
    }

    /// The handle of the deletion that can currently be undone.
    pub async fn pending(&self) -> Option<DeletionHandle> {
        self.slot.lock().await.as_ref().map(|pending| pending.handle)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::{
        collaborators::NoImageStore,
        core::{
            item::{NewItem, create_item, query_items},
            month_key::MonthKey,
            monthly::create_summary,
            reward::draw_winner,
        },
        entities::ItemStatus,
        test_utils::*,
    };
    use rust_decimal::Decimal;

    async fn item_with_image(
        db: &DatabaseConnection,
        title: &str,
        image_ref: &str,
    ) -> Result<item::Model> {
        let mut new_item = NewItem::new(title, Decimal::new(3_450, 2));
        new_item.notes = Some("saw it on a billboard".to_string());
        new_item.product_url = Some("https://shop.example/item".to_string());
        new_item.tags = ["impulse", "fashion"].into_iter().collect();
        new_item.image_ref = Some(image_ref.to_string());
        create_item(db, new_item, utc(2024, 3, 14)).await
    }

    fn buffer(
        db: &DatabaseConnection,
        images: &Arc<RecordingImageStore>,
        clock: &Arc<ManualClock>,
        grace: Duration,
    ) -> UndoBuffer {
        UndoBuffer::new(db.clone(), images.clone(), clock.clone(), grace)
    }

    #[tokio::test]
    async fn test_delete_then_undo_restores_every_field() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let original = item_with_image(&db, "Scarf", "img-scarf").await?;
        let handle = undo.delete(original.id).await?;

        assert!(get_item(&db, original.id).await?.is_none());
        assert_eq!(undo.pending().await, Some(handle));

        clock.advance(chrono::Duration::seconds(4));
        let restored = undo.undo(handle).await?;
        assert_eq!(restored, original);

        let march = query_items(&db, MonthKey::new(2024, 3)?, None).await?;
        assert_eq!(march, vec![original]);
        assert!(undo.pending().await.is_none());
        assert!(images.released().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_configured_buffer_without_image_store_flushes() -> Result<()> {
        let db = setup_test_db().await?;
        let settings = crate::config::settings::parse_settings("[undo]\ngrace_period_ms = 60000\n")?;
        let undo = UndoBuffer::new(
            db.clone(),
            Arc::new(NoImageStore),
            Arc::new(ManualClock::new(utc(2024, 3, 20))),
            settings.undo.grace_period(),
        );
        assert_eq!(undo.grace_period(), Duration::from_secs(60));

        let item = item_with_image(&db, "Lamp", "img-lamp").await?;
        let handle = undo.delete(item.id).await?;
        undo.flush().await;

        assert!(undo.pending().await.is_none());
        assert!(matches!(undo.undo(handle).await, Err(Error::Expired { .. })));
        assert!(get_item(&db, item.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_undo_just_after_window_is_expired() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let item = item_with_image(&db, "Boots", "img-boots").await?;
        let handle = undo.delete(item.id).await?;

        clock.advance(chrono::Duration::milliseconds(5_001));
        let result = undo.undo(handle).await;
        assert!(matches!(result, Err(Error::Expired { handle: h }) if h == handle.id()));

        assert!(get_item(&db, item.id).await?.is_none());
        assert_eq!(images.released(), vec!["img-boots".to_string()]);

        // Still expired on retry
        assert!(matches!(undo.undo(handle).await, Err(Error::Expired { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_timer_releases_image_after_grace_period() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, Duration::from_millis(20));

        let item = item_with_image(&db, "Watch", "img-watch").await?;
        let handle = undo.delete(item.id).await?;

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(images.released(), vec!["img-watch".to_string()]);
        assert!(undo.pending().await.is_none());
        assert!(matches!(undo.undo(handle).await, Err(Error::Expired { .. })));
        assert!(get_item(&db, item.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_new_delete_finalizes_pending_one() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let first = item_with_image(&db, "Ring", "img-ring").await?;
        let second = item_with_image(&db, "Belt", "img-belt").await?;

        let first_handle = undo.delete(first.id).await?;
        let second_handle = undo.delete(second.id).await?;
        assert_ne!(first_handle, second_handle);

        // The first deletion was finalized on the spot
        assert_eq!(images.released(), vec!["img-ring".to_string()]);
        assert!(matches!(
            undo.undo(first_handle).await,
            Err(Error::Expired { .. })
        ));
        assert!(get_item(&db, first.id).await?.is_none());

        // The second is still undoable
        let restored = undo.undo(second_handle).await?;
        assert_eq!(restored, second);
        assert_eq!(images.released().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_image_release_failure_is_not_propagated() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::failing());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let item = item_with_image(&db, "Vase", "img-vase").await?;
        undo.delete(item.id).await?;
        undo.flush().await;

        assert!(undo.pending().await.is_none());
        assert!(get_item(&db, item.id).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_item() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 3, 20)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let result = undo.delete(77).await;
        assert!(matches!(result, Err(Error::ItemNotFound { id: 77 })));
        assert!(undo.pending().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_restored_item_rejoins_its_month_summary() -> Result<()> {
        let db = setup_test_db().await?;
        let images = Arc::new(RecordingImageStore::default());
        let clock = Arc::new(ManualClock::new(utc(2024, 4, 2)));
        let undo = buffer(&db, &images, &clock, DEFAULT_GRACE_PERIOD);

        let only = item_with_image(&db, "Perfume", "img-perfume").await?;
        let summary = create_summary(&db, MonthKey::new(2024, 3)?, clock.now()).await?;

        let handle = undo.delete(only.id).await?;
        undo.undo(handle).await?;

        let outcome = draw_winner(&db, summary.id, clock.as_ref()).await?;
        assert_eq!(outcome.winner.id, only.id);
        assert_eq!(outcome.winner.status, ItemStatus::Won);
        Ok(())
    }
}
