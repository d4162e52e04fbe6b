//! Concert administration: the catalogue and its seat capacity.
//!
//! Capacity changes go through the conditional adjustment so that `available_seats` always
//! equals the new total minus the seats already held by active reservations.

use tracing::{info, instrument};

use crate::{
    db::{
        handlers::ConcertFilter,
        models::concerts::{ConcertCreateDBRequest, ConcertDBResponse, ConcertUpdateDBRequest},
        store::{ConcertStore, Database, Transaction},
    },
    errors::{Error, Result},
    types::{ConcertId, abbrev_uuid},
};

/// Requested changes to a concert. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct ConcertChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub total_seats: Option<i32>,
}

#[derive(Clone)]
pub struct ConcertInventory<D: Database> {
    db: D,
}

fn concert_not_found(id: ConcertId) -> Error {
    Error::NotFound {
        resource: "Concert".to_string(),
        id: id.to_string(),
    }
}

impl<D: Database> ConcertInventory<D> {
    pub fn new(db: D) -> Self {
        Self { db }
    }

    #[instrument(skip(self, request), fields(name = %request.name, total_seats = request.total_seats), err)]
    pub async fn create(&self, request: &ConcertCreateDBRequest) -> Result<ConcertDBResponse> {
        let mut tx = self.db.begin().await?;
        let concert = tx.create_concert(request).await?;
        tx.commit().await?;

        info!(concert_id = %abbrev_uuid(&concert.id), "Concert created");
        Ok(concert)
    }

    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn get(&self, id: ConcertId) -> Result<ConcertDBResponse> {
        let mut tx = self.db.begin().await?;
        let concert = tx.get_concert(id).await?;
        tx.commit().await?;
        concert.ok_or_else(|| concert_not_found(id))
    }

    /// A page of concerts, newest first, with the total matching count.
    #[instrument(skip(self, filter), fields(skip = filter.skip, limit = filter.limit), err)]
    pub async fn list(&self, filter: &ConcertFilter) -> Result<(Vec<ConcertDBResponse>, i64)> {
        let mut tx = self.db.begin().await?;
        let concerts = tx.list_concerts(filter).await?;
        let total = tx.count_concerts(filter).await?;
        tx.commit().await?;
        Ok((concerts, total))
    }

    /// Apply `changes` in one transaction.
    ///
    /// A capacity change below the number of reserved seats fails with `CapacityBelowReserved`
    /// and leaves the concert untouched, including any name or description change.
    #[instrument(skip(self, changes), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&self, id: ConcertId, changes: &ConcertChanges) -> Result<ConcertDBResponse> {
        let mut tx = self.db.begin().await?;

        let mut concert = tx.get_concert(id).await?.ok_or_else(|| concert_not_found(id))?;

        if let Some(new_total) = changes.total_seats {
            concert = match tx.adjust_capacity(id, new_total).await? {
                Some(adjusted) => adjusted,
                None => {
                    // Re-read inside the same transaction to report the count that blocked it
                    let current = tx.get_concert(id).await?.ok_or_else(|| concert_not_found(id))?;
                    tx.rollback().await?;
                    return Err(Error::CapacityBelowReserved {
                        reserved: current.reserved_seats(),
                        requested: new_total,
                    });
                }
            };
        }

        let details = ConcertUpdateDBRequest {
            name: changes.name.clone(),
            description: changes.description.clone(),
        };
        if !details.is_empty() {
            concert = tx
                .update_concert_details(id, &details)
                .await?
                .ok_or_else(|| concert_not_found(id))?;
        }

        tx.commit().await?;
        Ok(concert)
    }

    /// Delete a concert together with its reservations.
    #[instrument(skip(self), fields(concert_id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&self, id: ConcertId) -> Result<()> {
        let mut tx = self.db.begin().await?;
        if !tx.delete_concert(id).await? {
            return Err(concert_not_found(id));
        }
        tx.commit().await?;

        info!("Concert deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clock::Clock,
        db::{in_memory::InMemoryDatabase, store::ReservationLedger},
        reservations::{ReservationPolicy, ReservationService},
        test_utils::{ManualClock, assert_seat_invariants, create_test_user},
    };
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(name: &str, total_seats: i32) -> ConcertCreateDBRequest {
        ConcertCreateDBRequest {
            name: name.to_string(),
            description: "A night of music under the stars".to_string(),
            total_seats,
        }
    }

    async fn reserve_n(db: &InMemoryDatabase, concert_id: ConcertId, n: usize) {
        let service = ReservationService::new(
            db.clone(),
            ReservationPolicy::default(),
            Arc::new(ManualClock::default()) as Arc<dyn Clock>,
        );
        for i in 0..n {
            let user = create_test_user(db, &format!("holder{i}@example.com")).await;
            service.reserve(concert_id, user.id).await.unwrap();
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_create_starts_fully_available() {
        let inventory = ConcertInventory::new(InMemoryDatabase::new());

        let concert = inventory.create(&request("Night Shift", 250)).await.unwrap();
        assert_eq!(concert.total_seats, 250);
        assert_eq!(concert.available_seats, 250);
        assert_eq!(inventory.get(concert.id).await.unwrap(), concert);
    }

    #[test_log::test(tokio::test)]
    async fn test_get_unknown_concert() {
        let inventory = ConcertInventory::new(InMemoryDatabase::new());
        assert!(matches!(
            inventory.get(Uuid::new_v4()).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_shrink_below_reserved_is_rejected() {
        let db = InMemoryDatabase::new();
        let inventory = ConcertInventory::new(db.clone());
        let concert = inventory.create(&request("Night Shift", 10)).await.unwrap();
        reserve_n(&db, concert.id, 6).await;

        let changes = ConcertChanges {
            name: Some("Renamed".to_string()),
            total_seats: Some(5),
            ..Default::default()
        };
        let err = inventory.update(concert.id, &changes).await.unwrap_err();
        assert!(matches!(
            err,
            Error::CapacityBelowReserved {
                reserved: 6,
                requested: 5
            }
        ));

        // Nothing from the failed update was applied
        let unchanged = inventory.get(concert.id).await.unwrap();
        assert_eq!(unchanged.name, "Night Shift");
        assert_eq!(unchanged.total_seats, 10);
        assert_eq!(unchanged.available_seats, 4);
    }

    #[test_log::test(tokio::test)]
    async fn test_capacity_change_keeps_reserved_count() {
        let db = InMemoryDatabase::new();
        let inventory = ConcertInventory::new(db.clone());
        let concert = inventory.create(&request("Night Shift", 10)).await.unwrap();
        reserve_n(&db, concert.id, 3).await;

        let shrunk = inventory
            .update(
                concert.id,
                &ConcertChanges {
                    total_seats: Some(3),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((shrunk.total_seats, shrunk.available_seats), (3, 0));

        let grown = inventory
            .update(
                concert.id,
                &ConcertChanges {
                    total_seats: Some(20),
                    description: Some("Now with a bigger hall".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!((grown.total_seats, grown.available_seats), (20, 17));
        assert_eq!(grown.description, "Now with a bigger hall");
        assert_seat_invariants(&db, concert.id).await;
    }

    #[test_log::test(tokio::test)]
    async fn test_update_unknown_concert() {
        let inventory = ConcertInventory::new(InMemoryDatabase::new());
        let changes = ConcertChanges {
            total_seats: Some(5),
            ..Default::default()
        };
        assert!(matches!(
            inventory.update(Uuid::new_v4(), &changes).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_list_search_and_paging() {
        let inventory = ConcertInventory::new(InMemoryDatabase::new());
        for name in ["Jazz Brunch", "Jazz Night", "Opera Gala"] {
            inventory.create(&request(name, 10)).await.unwrap();
        }

        let (page, total) = inventory.list(&ConcertFilter::new(0, 2)).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].name, "Opera Gala");

        let filter = ConcertFilter::new(0, 10).with_search(Some("jazz".to_string()));
        let (page, total) = inventory.list(&filter).await.unwrap();
        assert_eq!(total, 2);
        assert!(page.iter().all(|c| c.name.starts_with("Jazz")));
    }

    #[test_log::test(tokio::test)]
    async fn test_delete_cascades_reservations() {
        let db = InMemoryDatabase::new();
        let inventory = ConcertInventory::new(db.clone());
        let concert = inventory.create(&request("Night Shift", 10)).await.unwrap();
        reserve_n(&db, concert.id, 2).await;

        inventory.delete(concert.id).await.unwrap();

        assert!(matches!(inventory.get(concert.id).await, Err(Error::NotFound { .. })));
        let mut tx = db.begin().await.unwrap();
        assert_eq!(tx.count_active_for_concert(concert.id).await.unwrap(), 0);
        drop(tx);

        assert!(matches!(inventory.delete(concert.id).await, Err(Error::NotFound { .. })));
    }

    // Cancels lock a ledger row then the concert; delete must not take them the other way round
    #[sqlx::test]
    async fn test_pg_delete_racing_cancels(pool: sqlx::PgPool) {
        let db = crate::db::postgres::PgDatabase::new(pool);
        let clock = Arc::new(ManualClock::default());
        let concert = crate::test_utils::create_test_concert(&db, 6).await;
        let reservations = ReservationService::new(db.clone(), ReservationPolicy::default(), clock as Arc<dyn Clock>);

        let mut held = Vec::new();
        for i in 0..6 {
            let user = create_test_user(&db, &format!("user{i}@example.com")).await;
            held.push(reservations.reserve(concert.id, user.id).await.unwrap());
        }

        let cancels: Vec<_> = held
            .into_iter()
            .map(|reservation| {
                let reservations = reservations.clone();
                tokio::spawn(async move { reservations.cancel(reservation.id, reservation.user_id).await })
            })
            .collect();
        let inventory = ConcertInventory::new(db.clone());
        let concert_id = concert.id;
        let delete = tokio::spawn(async move { inventory.delete(concert_id).await });

        delete.await.unwrap().unwrap();
        for result in futures::future::join_all(cancels).await {
            match result.unwrap() {
                Ok(_) | Err(Error::NotFound { .. }) => {}
                Err(other) => panic!("cancel failed: {other:?}"),
            }
        }

        let mut tx = db.begin().await.unwrap();
        assert!(tx.get_concert(concert_id).await.unwrap().is_none());
        assert_eq!(tx.count_active_for_concert(concert_id).await.unwrap(), 0);
    }
}
