use crate::error::WorkflowError;
use crate::store::WriteMode;
use crate::workflow::RentalWorkflow;
use rental_shared::{vehicle_status_for, RentalBooking, Vehicle, VehicleStatus};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum VehicleSync {
    /// The vehicle already had the derived status; nothing was written.
    Unchanged { vehicle: String, status: VehicleStatus },
    Updated {
        vehicle: String,
        from: VehicleStatus,
        to: VehicleStatus,
    },
    /// The booking has no vehicle, or its status implies no vehicle change.
    Untracked,
}

impl RentalWorkflow {
    /// Brings the booking's vehicle in line with the booking status. Safe to
    /// call repeatedly.
    pub async fn sync_vehicle_status(&self, booking: &RentalBooking) -> Result<VehicleSync, WorkflowError> {
        let Some(target) = vehicle_status_for(booking.status) else {
            debug!(booking = %booking.name, status = %booking.status, "Booking status implies no vehicle change");
            return Ok(VehicleSync::Untracked);
        };
        if booking.vehicle.is_empty() {
            return Ok(VehicleSync::Untracked);
        }
        self.set_vehicle_status(&booking.vehicle, target, &booking.name).await
    }

    /// Forces a vehicle to `target`, writing only when it differs.
    pub(crate) async fn set_vehicle_status(
        &self,
        vehicle: &str,
        target: VehicleStatus,
        booking: &str,
    ) -> Result<VehicleSync, WorkflowError> {
        let current: Vehicle = self.require(vehicle).await?;
        if current.status == target {
            debug!(vehicle, booking, status = %target, "Vehicle status unchanged");
            return Ok(VehicleSync::Unchanged {
                vehicle: vehicle.to_string(),
                status: target,
            });
        }

        self.store
            .set_value::<Vehicle>(vehicle, "status", target, WriteMode::Normal)
            .await?;
        info!(vehicle, booking, from = %current.status, to = %target, "Vehicle status updated");
        Ok(VehicleSync::Updated {
            vehicle: vehicle.to_string(),
            from: current.status,
            to: target,
        })
    }

    /// Retries the vehicle derivation for a stored booking.
    pub async fn refresh_vehicle_status(&self, booking: &str) -> Result<VehicleSync, WorkflowError> {
        let booking: RentalBooking = self.require(booking).await?;
        self.sync_vehicle_status(&booking).await
    }
}
