use crate::error::WorkflowError;
use crate::store::WriteMode;
use crate::workflow::{Outcome, RentalWorkflow, SideEffects};
use chrono::Utc;
use rental_shared::{
    ensure_can_inspect, BookingStatus, DocStatus, Document, InspectionStatus, InspectionType, RentalBooking,
    RuleViolation, VehicleInspection,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Free-form findings recorded with an inspection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InspectionDetails {
    pub notes: Option<String>,
    pub fuel_level: Option<String>,
    pub condition_summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum InspectionApplied {
    Applied { booking: String, status: BookingStatus },
    /// The booking already references this inspection.
    AlreadyApplied { booking: String, status: BookingStatus },
}

/// A submitted inspection and the booking status it led to.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedInspection {
    pub inspection: VehicleInspection,
    pub booking_status: BookingStatus,
}

/// Guards checked before an inspection of `kind` is committed against
/// `booking`. A pre-inspection on a draft booking also confirms it, so the
/// booking must be confirmable.
fn ensure_applicable(booking: &RentalBooking, kind: InspectionType) -> Result<(), RuleViolation> {
    ensure_can_inspect(booking, kind)?;
    if kind == InspectionType::PreInspection && booking.docstatus == DocStatus::Draft {
        booking.clone().validate_for_submit()?;
    }
    Ok(())
}

impl RentalWorkflow {
    pub async fn create_inspection(
        &self,
        booking: &str,
        kind: InspectionType,
        details: InspectionDetails,
    ) -> Result<VehicleInspection, WorkflowError> {
        let booking: RentalBooking = self.require(booking).await?;
        ensure_can_inspect(&booking, kind)?;

        let pending = self
            .open_linked::<VehicleInspection>(&booking.name)
            .await?
            .into_iter()
            .find(|inspection| inspection.inspection_type == kind && inspection.docstatus == DocStatus::Draft);
        if let Some(pending) = pending {
            return Err(RuleViolation::InspectionPending {
                booking: booking.name,
                kind,
                inspection: pending.name,
            }
            .into());
        }

        let inspection = VehicleInspection {
            vehicle: booking.vehicle.clone(),
            inspection_date: Some(Utc::now()),
            notes: details.notes,
            fuel_level: details.fuel_level,
            condition_summary: details.condition_summary,
            ..VehicleInspection::new(&booking.name, kind)
        };
        let inspection = self.store.insert(&inspection).await?;
        info!(inspection = %inspection.name, booking = %booking.name, %kind, "Inspection created");
        Ok(inspection)
    }

    /// Submits a draft inspection and writes its result back onto the booking.
    pub async fn submit_inspection(&self, name: &str) -> Result<Outcome<InspectionApplied>, WorkflowError> {
        let mut inspection: VehicleInspection = self.require(name).await?;
        if inspection.docstatus != DocStatus::Draft {
            return Err(RuleViolation::NotDraft {
                doctype: VehicleInspection::DOCTYPE,
                name: inspection.name,
                docstatus: inspection.docstatus,
            }
            .into());
        }

        let booking: RentalBooking = self.require(&inspection.rental_booking).await?;
        ensure_applicable(&booking, inspection.inspection_type)?;

        inspection.status = InspectionStatus::Submitted;
        self.store.submit(&mut inspection).await?;
        info!(inspection = %inspection.name, booking = %booking.name, kind = %inspection.inspection_type, "Inspection submitted");

        let mut effects = SideEffects::new();
        let status = self.apply_inspection(booking, &inspection, &mut effects).await?;
        Ok(effects.finish(InspectionApplied::Applied {
            booking: inspection.rental_booking,
            status,
        }))
    }

    /// Replays the write-back of an already submitted inspection, e.g. after
    /// the first attempt failed.
    pub async fn update_status_from_inspection(
        &self,
        booking: &str,
        kind: InspectionType,
        inspection: &str,
    ) -> Result<Outcome<InspectionApplied>, WorkflowError> {
        let booking: RentalBooking = self.require(booking).await?;
        let inspection: VehicleInspection = self.require(inspection).await?;
        if inspection.rental_booking != booking.name || inspection.inspection_type != kind {
            return Err(RuleViolation::InspectionMismatch {
                booking: booking.name,
                kind,
                inspection: inspection.name,
            }
            .into());
        }
        if booking.inspection_ref(kind) == Some(&inspection.name) {
            return Ok(Outcome::clean(InspectionApplied::AlreadyApplied {
                booking: booking.name,
                status: booking.status,
            }));
        }
        if inspection.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: VehicleInspection::DOCTYPE,
                name: inspection.name,
            }
            .into());
        }
        ensure_applicable(&booking, kind)?;

        let mut effects = SideEffects::new();
        let name = booking.name.clone();
        let status = self.apply_inspection(booking, &inspection, &mut effects).await?;
        Ok(effects.finish(InspectionApplied::Applied { booking: name, status }))
    }

    /// Pre: confirms a draft booking, then Out. Post: Returned. The booking
    /// write is part of the transition; the vehicle follows as a side effect.
    async fn apply_inspection(
        &self,
        mut booking: RentalBooking,
        inspection: &VehicleInspection,
        effects: &mut SideEffects,
    ) -> Result<BookingStatus, WorkflowError> {
        match inspection.inspection_type {
            InspectionType::PreInspection => {
                if booking.docstatus == DocStatus::Draft {
                    self.confirm(&mut booking, effects).await?;
                }
                booking.status = BookingStatus::Out;
                booking.pre_inspection = Some(inspection.name.clone());
            }
            InspectionType::PostInspection => {
                booking.status = BookingStatus::Returned;
                booking.post_inspection = Some(inspection.name.clone());
            }
        }
        self.store.save(&booking, WriteMode::AfterSubmit).await?;
        info!(booking = %booking.name, inspection = %inspection.name, to = %booking.status, "Booking updated from inspection");

        effects.absorb("update vehicle status", self.sync_vehicle_status(&booking).await);
        Ok(booking.status)
    }

    /// Cancels a submitted inspection and undoes its write-back when the
    /// booking still points at it.
    pub async fn cancel_inspection(&self, name: &str) -> Result<Outcome<VehicleInspection>, WorkflowError> {
        let mut inspection: VehicleInspection = self.require(name).await?;
        if inspection.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: VehicleInspection::DOCTYPE,
                name: inspection.name,
            }
            .into());
        }

        let booking = self.store.find::<RentalBooking>(&inspection.rental_booking).await?;
        if let Some(booking) = &booking {
            let owns_pre = booking.pre_inspection.as_deref() == Some(inspection.name.as_str());
            if inspection.inspection_type == InspectionType::PreInspection
                && owns_pre
                && !booking.status.is_terminal()
            {
                if let Some(post) = &booking.post_inspection {
                    return Err(RuleViolation::InspectionInUse {
                        inspection: inspection.name,
                        post_inspection: post.clone(),
                    }
                    .into());
                }
            }
        }

        self.store.cancel(&mut inspection).await?;
        info!(inspection = %inspection.name, booking = %inspection.rental_booking, "Inspection cancelled");

        let mut effects = SideEffects::new();
        if booking.is_some() {
            let reverted = effects
                .absorb("reset booking", self.revert_inspection(&inspection).await)
                .flatten();
            if let Some(booking) = reverted {
                effects.absorb("update vehicle status", self.sync_vehicle_status(&booking).await);
            }
        }
        Ok(effects.finish(inspection))
    }

    /// Clears the reference and status pair owned by `inspection`. Returns
    /// the booking when it was changed.
    async fn revert_inspection(&self, inspection: &VehicleInspection) -> Result<Option<RentalBooking>, WorkflowError> {
        let mut booking: RentalBooking = self.require(&inspection.rental_booking).await?;
        let kind = inspection.inspection_type;
        if booking.inspection_ref(kind) != Some(&inspection.name) || booking.status.is_terminal() {
            return Ok(None);
        }

        let from = booking.status;
        match kind {
            InspectionType::PreInspection => {
                booking.pre_inspection = None;
                booking.status = BookingStatus::Confirmed;
            }
            InspectionType::PostInspection => {
                booking.post_inspection = None;
                booking.status = BookingStatus::Out;
            }
        }
        self.store.save(&booking, WriteMode::AfterSubmit).await?;
        info!(booking = %booking.name, inspection = %inspection.name, %from, to = %booking.status, "Booking reset after inspection cancel");
        Ok(Some(booking))
    }

    pub async fn complete_pre_inspection(
        &self,
        booking: &str,
        notes: Option<String>,
    ) -> Result<Outcome<CompletedInspection>, WorkflowError> {
        let details = InspectionDetails {
            notes,
            ..Default::default()
        };
        self.complete_inspection(booking, InspectionType::PreInspection, details)
            .await
    }

    pub async fn complete_post_inspection(
        &self,
        booking: &str,
        details: InspectionDetails,
    ) -> Result<Outcome<CompletedInspection>, WorkflowError> {
        self.complete_inspection(booking, InspectionType::PostInspection, details)
            .await
    }

    /// Records and submits an inspection in one call.
    async fn complete_inspection(
        &self,
        booking: &str,
        kind: InspectionType,
        details: InspectionDetails,
    ) -> Result<Outcome<CompletedInspection>, WorkflowError> {
        let booking_doc: RentalBooking = self.require(booking).await?;
        ensure_applicable(&booking_doc, kind)?;

        let inspection = self.create_inspection(booking, kind, details).await?;
        let outcome = self.submit_inspection(&inspection.name).await?;
        let booking_status = match outcome.value {
            InspectionApplied::Applied { status, .. } | InspectionApplied::AlreadyApplied { status, .. } => status,
        };
        let inspection: VehicleInspection = self.require(&inspection.name).await?;
        Ok(Outcome {
            value: CompletedInspection {
                inspection,
                booking_status,
            },
            warnings: outcome.warnings,
        })
    }
}
