//! Domain types shared by the rental service: documents, statuses, the pure
//! derivation and guard functions, and the method reply envelope.

pub mod availability;
pub mod billing;
pub mod documents;
pub mod reply;
pub mod rules;
pub mod status;

pub use availability::{classify_overlap, Availability, Conflict, DateRange, OverlapType};
pub use billing::{draft_invoice, invoice_items, invoice_total};
pub use documents::{
    AdditionalService, Document, InvoiceItem, PaymentEntry, PaymentReference, RentalBooking, RentalContract,
    SalesInvoice, Vehicle, VehicleInspection,
};
pub use reply::{MethodReply, ReplyStatus};
pub use rules::{ensure_can_inspect, ensure_completable, ensure_invoiceable, RuleViolation};
pub use status::{
    contract_status_for, status_flow, vehicle_status_for, BookingStatus, ContractStatus, DocStatus,
    InspectionStatus, InspectionType, StatusStep, VehicleStatus,
};
