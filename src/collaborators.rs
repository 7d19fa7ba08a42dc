//! Interfaces to the collaborators the ledger core consumes but does not own.
//!
//! The host app supplies a clock, an image store and an entitlement source. The
//! core only ever calls these narrow traits, so tests can drive month boundaries
//! and grace windows deterministically.

use crate::errors::Result;
use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall-clock time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Owner of the images attached to items.
pub trait ImageStore: Send + Sync {
    /// Releases the stored image. Called once a deletion can no longer be undone.
    fn release(&self, image_ref: &str) -> Result<()>;
}

/// Image store for hosts that keep no images; releasing is a no-op.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImageStore;

impl ImageStore for NoImageStore {
    fn release(&self, image_ref: &str) -> Result<()> {
        tracing::debug!(image_ref, "No image store configured; nothing to release");
        Ok(())
    }
}

/// Tells the savings cap guard whether the account is exempt.
pub trait EntitlementSource: Send + Sync {
    /// Whether the account has premium access.
    fn has_premium_access(&self) -> bool;
}

/// Fixed entitlement, typically read from configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticEntitlement(pub bool);

impl EntitlementSource for StaticEntitlement {
    fn has_premium_access(&self) -> bool {
        self.0
    }
}
