use crate::documents::{RentalBooking, VehicleInspection};
use crate::status::{BookingStatus, DocStatus, InspectionType};
use chrono::NaiveDate;
use thiserror::Error;

/// A user-correctable business rule violation. Raised before any write of the
/// operation that detected it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("rental end date {end} must be after rental start date {start}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("{field} is required")]
    MissingField { field: &'static str },

    #[error("rate for additional service {service:?} cannot be negative")]
    NegativeRate { service: String },

    #[error("quantity for additional service {service:?} cannot be negative")]
    NegativeQuantity { service: String },

    #[error("{doctype} {name} does not exist")]
    UnknownDocument { doctype: &'static str, name: String },

    #[error("booking {booking} is {status}; cannot {action}")]
    WrongBookingStatus {
        booking: String,
        status: BookingStatus,
        action: &'static str,
    },

    #[error("{doctype} {name} must be submitted first")]
    NotSubmitted { doctype: &'static str, name: String },

    #[error("{doctype} {name} is {docstatus}, expected a draft")]
    NotDraft {
        doctype: &'static str,
        name: String,
        docstatus: DocStatus,
    },

    #[error("booking {booking} already has pre-inspection {inspection}")]
    PreInspectionExists { booking: String, inspection: String },

    #[error("booking {booking} has no pre-inspection; complete the pre-inspection first")]
    PreInspectionMissing { booking: String },

    #[error("booking {booking} already has post-inspection {inspection}")]
    PostInspectionExists { booking: String, inspection: String },

    #[error("booking {booking} has no post-inspection; complete the post-inspection first")]
    PostInspectionMissing { booking: String },

    #[error("post-inspection {inspection} must be submitted before the invoice is created")]
    PostInspectionNotSubmitted { inspection: String },

    #[error("{kind} {inspection} is already open for booking {booking}")]
    InspectionPending {
        booking: String,
        kind: InspectionType,
        inspection: String,
    },

    #[error("inspection {inspection} is not the {kind} of booking {booking}")]
    InspectionMismatch {
        booking: String,
        kind: InspectionType,
        inspection: String,
    },

    #[error("pre-inspection {inspection} cannot be cancelled while post-inspection {post_inspection} is recorded")]
    InspectionInUse {
        inspection: String,
        post_inspection: String,
    },

    #[error("both pre- and post-inspection must be submitted before booking {booking} can be completed")]
    InspectionsIncomplete { booking: String },

    #[error("sales invoice {invoice} already exists for booking {booking}")]
    InvoiceExists { booking: String, invoice: String },

    #[error("terms and conditions are required before submitting contract {contract}")]
    LegalTermsMissing { contract: String },

    #[error("contract {contract} already exists for booking {booking}")]
    ContractExists { booking: String, contract: String },
}

impl RuleViolation {
    /// Stable reason code carried in RPC replies.
    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::InvalidDateRange { .. } => "invalid_date_range",
            RuleViolation::MissingField { .. } => "missing_field",
            RuleViolation::NegativeRate { .. } => "negative_rate",
            RuleViolation::NegativeQuantity { .. } => "negative_quantity",
            RuleViolation::UnknownDocument { .. } => "unknown_document",
            RuleViolation::WrongBookingStatus { .. } => "wrong_booking_status",
            RuleViolation::NotSubmitted { .. } => "not_submitted",
            RuleViolation::NotDraft { .. } => "not_draft",
            RuleViolation::PreInspectionExists { .. } => "pre_inspection_exists",
            RuleViolation::PreInspectionMissing { .. } => "pre_inspection_missing",
            RuleViolation::PostInspectionExists { .. } => "post_inspection_exists",
            RuleViolation::PostInspectionMissing { .. } => "post_inspection_missing",
            RuleViolation::PostInspectionNotSubmitted { .. } => "post_inspection_not_submitted",
            RuleViolation::InspectionPending { .. } => "inspection_pending",
            RuleViolation::InspectionMismatch { .. } => "inspection_mismatch",
            RuleViolation::InspectionInUse { .. } => "inspection_in_use",
            RuleViolation::InspectionsIncomplete { .. } => "inspections_incomplete",
            RuleViolation::InvoiceExists { .. } => "invoice_exists",
            RuleViolation::LegalTermsMissing { .. } => "legal_terms_missing",
            RuleViolation::ContractExists { .. } => "contract_exists",
        }
    }
}

/// Guard for recording an inspection of `kind` against `booking`, used both at
/// creation and again, on freshly loaded state, right before the write-back.
pub fn ensure_can_inspect(booking: &RentalBooking, kind: InspectionType) -> Result<(), RuleViolation> {
    match kind {
        InspectionType::PreInspection => {
            if let Some(existing) = &booking.pre_inspection {
                return Err(RuleViolation::PreInspectionExists {
                    booking: booking.name.clone(),
                    inspection: existing.clone(),
                });
            }
            if !matches!(booking.status, BookingStatus::Draft | BookingStatus::Confirmed) {
                return Err(RuleViolation::WrongBookingStatus {
                    booking: booking.name.clone(),
                    status: booking.status,
                    action: "record a pre-inspection",
                });
            }
        }
        InspectionType::PostInspection => {
            if booking.pre_inspection.is_none() {
                return Err(RuleViolation::PreInspectionMissing {
                    booking: booking.name.clone(),
                });
            }
            if let Some(existing) = &booking.post_inspection {
                return Err(RuleViolation::PostInspectionExists {
                    booking: booking.name.clone(),
                    inspection: existing.clone(),
                });
            }
            if booking.status != BookingStatus::Out {
                return Err(RuleViolation::WrongBookingStatus {
                    booking: booking.name.clone(),
                    status: booking.status,
                    action: "record a post-inspection",
                });
            }
        }
    }
    Ok(())
}

/// Invoice preconditions, in the order they are reported.
pub fn ensure_invoiceable(
    booking: &RentalBooking,
    post_inspection: Option<&VehicleInspection>,
) -> Result<(), RuleViolation> {
    if booking.status != BookingStatus::Returned {
        return Err(RuleViolation::WrongBookingStatus {
            booking: booking.name.clone(),
            status: booking.status,
            action: "create a sales invoice",
        });
    }
    let Some(reference) = &booking.post_inspection else {
        return Err(RuleViolation::PostInspectionMissing {
            booking: booking.name.clone(),
        });
    };
    match post_inspection {
        Some(inspection) if inspection.docstatus == DocStatus::Submitted => {}
        _ => {
            return Err(RuleViolation::PostInspectionNotSubmitted {
                inspection: reference.clone(),
            })
        }
    }
    if let Some(invoice) = &booking.sales_invoice {
        return Err(RuleViolation::InvoiceExists {
            booking: booking.name.clone(),
            invoice: invoice.clone(),
        });
    }
    Ok(())
}

/// Manual completion needs a returned booking with both inspections submitted.
pub fn ensure_completable(
    booking: &RentalBooking,
    pre_inspection: Option<&VehicleInspection>,
    post_inspection: Option<&VehicleInspection>,
) -> Result<(), RuleViolation> {
    if booking.status != BookingStatus::Returned {
        return Err(RuleViolation::WrongBookingStatus {
            booking: booking.name.clone(),
            status: booking.status,
            action: "complete the rental",
        });
    }
    let submitted = |inspection: Option<&VehicleInspection>| {
        inspection.is_some_and(|inspection| inspection.docstatus == DocStatus::Submitted)
    };
    if !submitted(pre_inspection) || !submitted(post_inspection) {
        return Err(RuleViolation::InspectionsIncomplete {
            booking: booking.name.clone(),
        });
    }
    Ok(())
}
