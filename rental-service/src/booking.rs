use crate::error::WorkflowError;
use crate::store::WriteMode;
use crate::workflow::{Outcome, RentalWorkflow, SideEffects};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::Zero;
use rental_shared::{
    ensure_completable, AdditionalService, BookingStatus, ContractStatus, DocStatus, Document, InspectionStatus,
    InspectionType, RentalBooking, RentalContract, RuleViolation, SalesInvoice, Vehicle, VehicleInspection,
    VehicleStatus,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Editable fields of a draft booking. A missing `name` creates a new one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BookingInput {
    pub name: Option<String>,
    pub customer: String,
    pub vehicle: String,
    pub rental_start: Option<NaiveDate>,
    pub rental_end: Option<NaiveDate>,
    pub rate_per_day: Option<BigDecimal>,
    pub additional_services: Vec<AdditionalService>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionSummary {
    pub name: String,
    pub status: InspectionStatus,
    pub docstatus: DocStatus,
    pub inspection_date: Option<DateTime<Utc>>,
}

impl From<&VehicleInspection> for InspectionSummary {
    fn from(inspection: &VehicleInspection) -> Self {
        Self {
            name: inspection.name.clone(),
            status: inspection.status,
            docstatus: inspection.docstatus,
            inspection_date: inspection.inspection_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContractSummary {
    pub name: String,
    pub contract_status: ContractStatus,
    pub docstatus: DocStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceSummary {
    pub name: String,
    pub docstatus: DocStatus,
    pub grand_total: BigDecimal,
    pub outstanding_amount: BigDecimal,
}

/// Denormalized view of a booking and everything linked to it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingSummary {
    pub booking: String,
    pub customer: String,
    pub vehicle: String,
    pub vehicle_status: Option<VehicleStatus>,
    pub status: BookingStatus,
    pub docstatus: DocStatus,
    pub rental_start: Option<NaiveDate>,
    pub rental_end: Option<NaiveDate>,
    pub no_days: i64,
    pub rate_per_day: BigDecimal,
    pub amount: BigDecimal,
    pub pre_inspection: Option<InspectionSummary>,
    pub post_inspection: Option<InspectionSummary>,
    pub rental_contract: Option<ContractSummary>,
    pub sales_invoice: Option<InvoiceSummary>,
}

impl RentalWorkflow {
    /// Creates or edits a draft booking. The rate defaults from the vehicle
    /// when none is given.
    pub async fn save_booking(&self, input: BookingInput) -> Result<RentalBooking, WorkflowError> {
        let mut booking = match &input.name {
            Some(name) => {
                let existing: RentalBooking = self.require(name).await?;
                if existing.docstatus != DocStatus::Draft {
                    return Err(RuleViolation::NotDraft {
                        doctype: RentalBooking::DOCTYPE,
                        name: existing.name,
                        docstatus: existing.docstatus,
                    }
                    .into());
                }
                existing
            }
            None => RentalBooking::default(),
        };

        booking.customer = input.customer;
        booking.vehicle = input.vehicle;
        booking.rental_start = input.rental_start;
        booking.rental_end = input.rental_end;
        booking.additional_services = input.additional_services;
        match input.rate_per_day {
            Some(rate) => booking.rate_per_day = rate,
            None if !booking.vehicle.is_empty() => {
                let vehicle: Vehicle = self.require(&booking.vehicle).await?;
                booking.rate_per_day = vehicle.rate_per_day;
            }
            None => booking.rate_per_day = BigDecimal::zero(),
        }
        booking.validate()?;

        if booking.name.is_empty() {
            let booking = self.store.insert(&booking).await?;
            info!(booking = %booking.name, vehicle = %booking.vehicle, "Rental booking created");
            Ok(booking)
        } else {
            self.store.save(&booking, WriteMode::Normal).await?;
            info!(booking = %booking.name, "Rental booking saved");
            Ok(booking)
        }
    }

    pub async fn submit_booking(&self, name: &str) -> Result<Outcome<RentalBooking>, WorkflowError> {
        let mut booking: RentalBooking = self.require(name).await?;
        let mut effects = SideEffects::new();
        self.confirm(&mut booking, &mut effects).await?;
        Ok(effects.finish(booking))
    }

    /// Draft → Confirmed: submits the booking, then books the vehicle.
    pub(crate) async fn confirm(
        &self,
        booking: &mut RentalBooking,
        effects: &mut SideEffects,
    ) -> Result<(), WorkflowError> {
        if booking.docstatus != DocStatus::Draft {
            return Err(RuleViolation::NotDraft {
                doctype: RentalBooking::DOCTYPE,
                name: booking.name.clone(),
                docstatus: booking.docstatus,
            }
            .into());
        }
        booking.validate_for_submit()?;
        booking.status = BookingStatus::Confirmed;
        booking.submitted_at = Some(Utc::now());
        self.store.submit(booking).await?;
        info!(booking = %booking.name, to = %booking.status, "Rental booking submitted");

        effects.absorb("update vehicle status", self.sync_vehicle_status(booking).await);
        Ok(())
    }

    /// Cancels a booking and unwinds what it holds: inspections, the vehicle
    /// and the contract. Each of those steps is isolated; only the final
    /// booking write can fail the call.
    pub async fn cancel_booking(&self, name: &str) -> Result<Outcome<RentalBooking>, WorkflowError> {
        let mut booking: RentalBooking = self.require(name).await?;
        if booking.status.is_terminal() {
            return Err(RuleViolation::WrongBookingStatus {
                booking: booking.name,
                status: booking.status,
                action: "cancel",
            }
            .into());
        }
        if booking.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: RentalBooking::DOCTYPE,
                name: booking.name,
            }
            .into());
        }

        let mut effects = SideEffects::new();

        let inspections = effects
            .absorb("list inspections", self.open_linked::<VehicleInspection>(&booking.name).await)
            .unwrap_or_default();
        for inspection in inspections {
            let step = format!("withdraw inspection {}", inspection.name);
            let kind = inspection.inspection_type;
            let name = inspection.name.clone();
            if effects.absorb(&step, self.withdraw_inspection(inspection).await).is_some()
                && booking.inspection_ref(kind) == Some(&name)
            {
                match kind {
                    InspectionType::PreInspection => booking.pre_inspection = None,
                    InspectionType::PostInspection => booking.post_inspection = None,
                }
            }
        }

        if !booking.vehicle.is_empty() {
            effects.absorb(
                "release vehicle",
                self.set_vehicle_status(&booking.vehicle, VehicleStatus::Available, &booking.name)
                    .await,
            );
        }

        booking.status = BookingStatus::Cancelled;
        if let Some(contract) = effects
            .absorb("terminate contract", self.push_contract_status(&booking).await)
            .flatten()
        {
            if booking.rental_contract.as_deref() == Some(contract.as_str()) {
                booking.rental_contract = None;
            }
        }

        booking.cancelled_at = Some(Utc::now());
        self.store.cancel(&mut booking).await?;
        info!(booking = %booking.name, to = %booking.status, "Rental booking cancelled");
        Ok(effects.finish(booking))
    }

    /// Cancels a submitted inspection or deletes a draft one, without writing
    /// back to the booking.
    async fn withdraw_inspection(&self, mut inspection: VehicleInspection) -> Result<(), WorkflowError> {
        match inspection.docstatus {
            DocStatus::Submitted => {
                self.store.cancel(&mut inspection).await?;
                info!(inspection = %inspection.name, booking = %inspection.rental_booking, "Inspection cancelled with booking");
            }
            DocStatus::Draft => {
                self.store.delete::<VehicleInspection>(&inspection.name).await?;
                info!(inspection = %inspection.name, booking = %inspection.rental_booking, "Draft inspection deleted with booking");
            }
            DocStatus::Cancelled => {}
        }
        Ok(())
    }

    /// Manual completion of a returned booking whose inspections are both
    /// submitted.
    pub async fn complete_rental(&self, name: &str) -> Result<Outcome<RentalBooking>, WorkflowError> {
        let mut booking: RentalBooking = self.require(name).await?;
        let pre = self.linked_inspection(&booking, InspectionType::PreInspection).await?;
        let post = self.linked_inspection(&booking, InspectionType::PostInspection).await?;
        ensure_completable(&booking, pre.as_ref(), post.as_ref())?;

        let mut effects = SideEffects::new();
        self.complete(&mut booking, &mut effects).await?;
        Ok(effects.finish(booking))
    }

    /// Returned → Completed, then frees the vehicle and closes the contract.
    pub(crate) async fn complete(
        &self,
        booking: &mut RentalBooking,
        effects: &mut SideEffects,
    ) -> Result<(), WorkflowError> {
        let from = booking.status;
        booking.status = BookingStatus::Completed;
        booking.completed_at = Some(Utc::now());
        self.store.save(booking, WriteMode::AfterSubmit).await?;
        info!(booking = %booking.name, %from, to = %booking.status, "Rental completed");

        effects.absorb("update vehicle status", self.sync_vehicle_status(booking).await);
        effects.absorb("update contract status", self.push_contract_status(booking).await);
        Ok(())
    }

    /// The inspection of `kind` the booking references, if it still exists.
    pub(crate) async fn linked_inspection(
        &self,
        booking: &RentalBooking,
        kind: InspectionType,
    ) -> Result<Option<VehicleInspection>, WorkflowError> {
        match booking.inspection_ref(kind) {
            Some(name) => Ok(self.store.find::<VehicleInspection>(name).await?),
            None => Ok(None),
        }
    }

    pub async fn booking_summary(&self, name: &str) -> Result<BookingSummary, WorkflowError> {
        let booking: RentalBooking = self.require(name).await?;

        let vehicle_status = if booking.vehicle.is_empty() {
            None
        } else {
            self.store
                .find::<Vehicle>(&booking.vehicle)
                .await?
                .map(|vehicle| vehicle.status)
        };

        let pre_inspection = self.inspection_summary(&booking, InspectionType::PreInspection).await?;
        let post_inspection = self.inspection_summary(&booking, InspectionType::PostInspection).await?;

        let rental_contract = match &booking.rental_contract {
            Some(contract) => self.store.find::<RentalContract>(contract).await?,
            None => self.open_linked::<RentalContract>(&booking.name).await?.into_iter().next(),
        }
        .map(|contract| ContractSummary {
            name: contract.name,
            contract_status: contract.contract_status,
            docstatus: contract.docstatus,
        });

        let sales_invoice = match &booking.sales_invoice {
            Some(invoice) => self.store.find::<SalesInvoice>(invoice).await?,
            None => None,
        }
        .map(|invoice| InvoiceSummary {
            name: invoice.name,
            docstatus: invoice.docstatus,
            grand_total: invoice.grand_total,
            outstanding_amount: invoice.outstanding_amount,
        });

        Ok(BookingSummary {
            booking: booking.name,
            customer: booking.customer,
            vehicle: booking.vehicle,
            vehicle_status,
            status: booking.status,
            docstatus: booking.docstatus,
            rental_start: booking.rental_start,
            rental_end: booking.rental_end,
            no_days: booking.no_days,
            rate_per_day: booking.rate_per_day,
            amount: booking.amount,
            pre_inspection,
            post_inspection,
            rental_contract,
            sales_invoice,
        })
    }

    /// The linked inspection of `kind`, or else a draft still in progress.
    async fn inspection_summary(
        &self,
        booking: &RentalBooking,
        kind: InspectionType,
    ) -> Result<Option<InspectionSummary>, WorkflowError> {
        let inspection = match self.linked_inspection(booking, kind).await? {
            Some(inspection) => Some(inspection),
            None => self
                .open_linked::<VehicleInspection>(&booking.name)
                .await?
                .into_iter()
                .find(|inspection| inspection.inspection_type == kind),
        };
        Ok(inspection.as_ref().map(InspectionSummary::from))
    }
}
