//! Seat reservations.
//!
//! - [`policy`]: lifecycle rules (one active reservation per user and concert, re-booking
//!   cooldown, ownership)
//! - [`service`]: the transactional reserve/cancel protocol over the store traits
//!
//! ```ignore
//! let service = ReservationService::new(db, ReservationPolicy::default(), Arc::new(SystemClock));
//! let reservation = service.reserve(concert_id, user_id).await?;
//! service.cancel(reservation.id, user_id).await?;
//! ```

pub mod policy;
pub mod service;

pub use policy::{Eligibility, ReservationPolicy};
pub use service::{ReservationDetails, ReservationService};
