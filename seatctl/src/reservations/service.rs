//! The seat allocation protocol.
//!
//! `reserve` and `cancel` each run as one transaction. The conditional decrement is the only
//! place a seat is taken, so the advisory pre-check can be stale without overselling. Every
//! error path rolls the transaction back before returning the error unchanged.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::{
    clock::Clock,
    db::{
        handlers::ReservationFilter,
        models::{
            concerts::ConcertDBResponse,
            reservations::{ReservationCreateDBRequest, ReservationDBResponse, ReservationStatus},
            users::UserDBResponse,
        },
        store::{ConcertStore, Database, ReservationLedger, Transaction, UserDirectory},
    },
    errors::{Error, Result},
    metrics::{ReservationOperation, record_reservation_outcome},
    reservations::policy::{Eligibility, ReservationPolicy},
    types::{ConcertId, ReservationId, UserId, abbrev_uuid},
};

const RESERVATION_PAIR_CONSTRAINT: &str = "reservations_user_concert_unique";

/// A ledger row as listed: the concert it books and, for the all-users listing, its holder.
#[derive(Debug, Clone)]
pub struct ReservationDetails {
    pub reservation: ReservationDBResponse,
    pub concert: Option<ConcertDBResponse>,
    pub user: Option<UserDBResponse>,
}

pub struct ReservationService<D: Database> {
    db: D,
    policy: ReservationPolicy,
    clock: Arc<dyn Clock>,
}

impl<D: Database> Clone for ReservationService<D> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            policy: self.policy,
            clock: self.clock.clone(),
        }
    }
}

impl<D: Database> ReservationService<D> {
    pub fn new(db: D, policy: ReservationPolicy, clock: Arc<dyn Clock>) -> Self {
        Self { db, policy, clock }
    }

    pub fn policy(&self) -> &ReservationPolicy {
        &self.policy
    }

    /// Reserve one seat of `concert_id` for `user_id`.
    ///
    /// Creates the pair's ledger row on first booking and reactivates the cancelled row on
    /// re-booking, so the returned id is stable across cancel/re-book cycles.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&concert_id), user_id = %abbrev_uuid(&user_id)))]
    pub async fn reserve(&self, concert_id: ConcertId, user_id: UserId) -> Result<ReservationDBResponse> {
        let result = async {
            let mut tx = self.db.begin().await?;
            let outcome = self.reserve_in(&mut tx, concert_id, user_id).await;
            finish(tx, outcome).await
        }
        .await;

        record_reservation_outcome(ReservationOperation::Reserve, &result);
        if let Ok(reservation) = &result {
            info!(reservation_id = %abbrev_uuid(&reservation.id), "Seat reserved");
        }
        result
    }

    async fn reserve_in(&self, tx: &mut D::Tx, concert_id: ConcertId, user_id: UserId) -> Result<ReservationDBResponse> {
        let concert = tx.get_concert(concert_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Concert".to_string(),
            id: concert_id.to_string(),
        })?;

        if concert.available_seats <= 0 {
            debug!(reason = "pre_check", "No seats available");
            return Err(Error::NoSeatsAvailable { concert_id });
        }

        let now = self.clock.now();
        let existing = tx.find_by_user_and_concert(user_id, concert_id).await?;
        let eligibility = self.policy.evaluate(existing, now)?;

        if !tx.decrement_if_available(concert_id).await? {
            info!(reason = "race_lost", "No seats available");
            return Err(Error::NoSeatsAvailable { concert_id });
        }

        match eligibility {
            Eligibility::New => {
                let request = ReservationCreateDBRequest::active(user_id, concert_id, now);
                tx.create_reservation(&request).await.map_err(|e| {
                    // A concurrent first-time booking for the same pair committed first
                    if e.is_unique_violation_on(RESERVATION_PAIR_CONSTRAINT) {
                        Error::AlreadyReserved { concert_id }
                    } else {
                        e.into()
                    }
                })
            }
            Eligibility::Reactivate(mut reservation) => {
                debug!(reservation_id = %abbrev_uuid(&reservation.id), "Reactivating cancelled reservation");
                reservation.status = ReservationStatus::Active;
                reservation.updated_at = now;
                Ok(tx.save_reservation(&reservation).await?)
            }
        }
    }

    /// Cancel a reservation on behalf of `requester_id` and return its seat.
    #[instrument(skip(self), fields(reservation_id = %abbrev_uuid(&reservation_id), user_id = %abbrev_uuid(&requester_id)))]
    pub async fn cancel(&self, reservation_id: ReservationId, requester_id: UserId) -> Result<ReservationDBResponse> {
        let result = async {
            let mut tx = self.db.begin().await?;
            let outcome = self.cancel_in(&mut tx, reservation_id, requester_id).await;
            finish(tx, outcome).await
        }
        .await;

        record_reservation_outcome(ReservationOperation::Cancel, &result);
        if result.is_ok() {
            info!("Reservation cancelled");
        }
        result
    }

    async fn cancel_in(&self, tx: &mut D::Tx, reservation_id: ReservationId, requester_id: UserId) -> Result<ReservationDBResponse> {
        let mut reservation = tx.get_reservation(reservation_id).await?.ok_or_else(|| Error::NotFound {
            resource: "Reservation".to_string(),
            id: reservation_id.to_string(),
        })?;

        self.policy.ensure_owner(&reservation, requester_id)?;
        self.policy.ensure_cancellable(&reservation)?;

        if !tx.increment_available(reservation.concert_id).await? {
            return Err(Error::NotFound {
                resource: "Concert".to_string(),
                id: reservation.concert_id.to_string(),
            });
        }

        reservation.status = ReservationStatus::Cancelled;
        reservation.updated_at = self.clock.now();
        Ok(tx.save_reservation(&reservation).await?)
    }

    /// A user's own reservations, newest first, with the total count.
    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn list_for_user(&self, user_id: UserId, skip: i64, limit: i64) -> Result<(Vec<ReservationDetails>, i64)> {
        self.list(&ReservationFilter::new(skip, limit).for_user(user_id), false).await
    }

    /// All reservations matching `filter`, newest first, with their holders and the total count.
    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list_all(&self, filter: &ReservationFilter) -> Result<(Vec<ReservationDetails>, i64)> {
        self.list(filter, true).await
    }

    async fn list(&self, filter: &ReservationFilter, with_users: bool) -> Result<(Vec<ReservationDetails>, i64)> {
        let mut tx = self.db.begin().await?;
        let reservations = tx.list_reservations(filter).await?;
        let total = tx.count_reservations(filter).await?;

        let mut concert_ids: Vec<ConcertId> = reservations.iter().map(|r| r.concert_id).collect();
        concert_ids.sort_unstable();
        concert_ids.dedup();
        let concerts = tx.get_concerts_bulk(&concert_ids).await?;

        let users = if with_users {
            let mut user_ids: Vec<UserId> = reservations.iter().map(|r| r.user_id).collect();
            user_ids.sort_unstable();
            user_ids.dedup();
            tx.get_users_bulk(&user_ids).await?
        } else {
            Default::default()
        };
        tx.commit().await?;

        let details = reservations
            .into_iter()
            .map(|reservation| ReservationDetails {
                concert: concerts.get(&reservation.concert_id).cloned(),
                user: users.get(&reservation.user_id).cloned(),
                reservation,
            })
            .collect();
        Ok((details, total))
    }
}

/// Commit on success; roll back and hand the original error back otherwise.
async fn finish<T: Transaction, R>(tx: T, outcome: Result<R>) -> Result<R> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Failed to roll back transaction");
            }
            Err(e)
        }
    }
}
