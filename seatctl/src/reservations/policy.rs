//! Reservation lifecycle rules.
//!
//! A (user, concert) pair moves NONE -> ACTIVE -> CANCELLED -> ACTIVE -> ... and never back to
//! NONE. Re-activating a cancelled row requires the re-booking cooldown to have elapsed since
//! the cancellation (the row's `updated_at`).

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    db::models::reservations::{ReservationDBResponse, ReservationStatus},
    errors::{Error, Result},
    types::UserId,
};

/// What the protocol should do for a reserve request, given the pair's existing ledger row.
#[derive(Debug, Clone, PartialEq)]
pub enum Eligibility {
    /// No row for the pair yet: insert one
    New,
    /// A cancelled row past its cooldown: flip it back to active
    Reactivate(ReservationDBResponse),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationPolicy {
    rebooking_cooldown: Duration,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_REBOOKING_COOLDOWN)
    }
}

impl ReservationPolicy {
    pub const DEFAULT_REBOOKING_COOLDOWN: Duration = Duration::from_secs(10 * 60);

    pub fn new(rebooking_cooldown: Duration) -> Self {
        Self { rebooking_cooldown }
    }

    pub fn rebooking_cooldown(&self) -> Duration {
        self.rebooking_cooldown
    }

    /// Decide whether a reserve may proceed.
    ///
    /// Fails with `AlreadyReserved` for an active row and `CooldownActive` for a row cancelled
    /// less than the cooldown ago.
    pub fn evaluate(&self, existing: Option<ReservationDBResponse>, now: DateTime<Utc>) -> Result<Eligibility> {
        let Some(existing) = existing else {
            return Ok(Eligibility::New);
        };

        match existing.status {
            ReservationStatus::Active => Err(Error::AlreadyReserved {
                concert_id: existing.concert_id,
            }),
            ReservationStatus::Cancelled => match self.remaining_cooldown(existing.updated_at, now) {
                Some(remaining) => Err(Error::CooldownActive {
                    remaining_minutes: minutes_rounded_up(remaining),
                }),
                None => Ok(Eligibility::Reactivate(existing)),
            },
        }
    }

    /// Time left before a reservation cancelled at `cancelled_at` may be re-booked, or `None` if
    /// the cooldown has elapsed.
    pub fn remaining_cooldown(&self, cancelled_at: DateTime<Utc>, now: DateTime<Utc>) -> Option<TimeDelta> {
        let cooldown = TimeDelta::from_std(self.rebooking_cooldown).unwrap_or(TimeDelta::MAX);
        let elapsed = now - cancelled_at;
        let remaining = cooldown - elapsed;
        (remaining > TimeDelta::zero()).then_some(remaining)
    }

    /// Only the owner may cancel a reservation.
    pub fn ensure_owner(&self, reservation: &ReservationDBResponse, requester: UserId) -> Result<()> {
        if reservation.user_id != requester {
            return Err(Error::Forbidden {
                message: "You can only cancel your own reservations".to_string(),
            });
        }
        Ok(())
    }

    pub fn ensure_cancellable(&self, reservation: &ReservationDBResponse) -> Result<()> {
        if reservation.status == ReservationStatus::Cancelled {
            return Err(Error::AlreadyCancelled {
                reservation_id: reservation.id,
            });
        }
        Ok(())
    }
}

/// Whole minutes, rounded up, never less than one.
fn minutes_rounded_up(remaining: TimeDelta) -> i64 {
    let millis = remaining.num_milliseconds().max(0);
    ((millis + 59_999) / 60_000).max(1)
}
