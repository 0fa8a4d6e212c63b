use crate::error::WorkflowError;
use crate::store::Filter;
use crate::workflow::RentalWorkflow;
use chrono::NaiveDate;
use rental_shared::{classify_overlap, Availability, BookingStatus, Conflict, DateRange, DocStatus, RentalBooking};

impl RentalWorkflow {
    /// Submitted, still running bookings of `vehicle` whose dates overlap the
    /// requested range. Read-only.
    pub async fn vehicle_availability(
        &self,
        vehicle: &str,
        start: NaiveDate,
        end: NaiveDate,
        exclude_booking: Option<&str>,
    ) -> Result<Availability, WorkflowError> {
        let requested = DateRange::new(start, end)?;

        let mut filters = vec![
            Filter::eq("vehicle", vehicle),
            Filter::eq("docstatus", DocStatus::Submitted),
            Filter::not_in("status", &[BookingStatus::Cancelled, BookingStatus::Completed]),
        ];
        if let Some(excluded) = exclude_booking {
            filters.push(Filter::ne("name", excluded));
        }

        let conflicts: Vec<Conflict> = self
            .store
            .list::<RentalBooking>(&filters)
            .await?
            .into_iter()
            .filter_map(|booking| {
                let (Some(rental_start), Some(rental_end)) = (booking.rental_start, booking.rental_end) else {
                    return None;
                };
                let existing = DateRange {
                    start: rental_start,
                    end: rental_end,
                };
                let overlap_type = classify_overlap(&requested, &existing)?;
                Some(Conflict {
                    booking: booking.name,
                    customer: booking.customer,
                    rental_start,
                    rental_end,
                    status: booking.status,
                    overlap_type,
                })
            })
            .collect();

        Ok(Availability {
            vehicle: vehicle.to_string(),
            available: conflicts.is_empty(),
            conflicts,
        })
    }
}
