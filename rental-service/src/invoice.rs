use crate::error::WorkflowError;
use crate::store::{Filter, WriteMode};
use crate::workflow::{Outcome, RentalWorkflow, SideEffects};
use bigdecimal::BigDecimal;
use chrono::Utc;
use rental_shared::{
    draft_invoice, ensure_invoiceable, BookingStatus, DocStatus, InspectionType, PaymentEntry, RentalBooking,
    SalesInvoice,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum InvoiceCreation {
    Created(SalesInvoice),
    /// An open invoice for the booking existed without the booking pointing
    /// at it; the link was restored instead of billing twice.
    Relinked(SalesInvoice),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum PaymentCheck {
    Completed,
    AlreadyCompleted,
    PendingPayment { invoice: String, outstanding_amount: BigDecimal },
    NotReady { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookingCheck {
    pub booking: String,
    #[serde(flatten)]
    pub result: PaymentCheck,
}

impl RentalWorkflow {
    pub async fn create_sales_invoice_from_booking(&self, booking: &str) -> Result<InvoiceCreation, WorkflowError> {
        let booking: RentalBooking = self.require(booking).await?;
        let post = self.linked_inspection(&booking, InspectionType::PostInspection).await?;
        ensure_invoiceable(&booking, post.as_ref())?;

        if let Some(existing) = self.open_linked::<SalesInvoice>(&booking.name).await?.into_iter().next() {
            self.link_invoice(&booking, &existing).await?;
            info!(booking = %booking.name, invoice = %existing.name, "Existing sales invoice relinked");
            return Ok(InvoiceCreation::Relinked(existing));
        }

        let invoice = draft_invoice(&booking, &self.settings.rental_item, Utc::now().date_naive());
        let invoice = self.store.insert(&invoice).await?;
        info!(booking = %booking.name, invoice = %invoice.name, grand_total = %invoice.grand_total, "Sales invoice created");
        self.link_invoice(&booking, &invoice).await?;
        Ok(InvoiceCreation::Created(invoice))
    }

    async fn link_invoice(&self, booking: &RentalBooking, invoice: &SalesInvoice) -> Result<(), WorkflowError> {
        self.store
            .set_value::<RentalBooking>(&booking.name, "sales_invoice", &invoice.name, WriteMode::AfterSubmit)
            .await?;
        Ok(())
    }

    /// Completes a returned booking once its invoice is submitted and fully
    /// paid. Every other state is reported without writing anything.
    pub async fn check_and_complete_if_paid(&self, booking: &str) -> Result<Outcome<PaymentCheck>, WorkflowError> {
        let mut booking: RentalBooking = self.require(booking).await?;
        match booking.status {
            BookingStatus::Completed => return Ok(Outcome::clean(PaymentCheck::AlreadyCompleted)),
            BookingStatus::Returned => {}
            status => {
                return Ok(Outcome::clean(PaymentCheck::NotReady {
                    reason: format!("booking {} is {status}, not Returned", booking.name),
                }))
            }
        }

        let Some(invoice_name) = booking.sales_invoice.clone() else {
            return Ok(Outcome::clean(PaymentCheck::NotReady {
                reason: format!("booking {} has no sales invoice", booking.name),
            }));
        };
        let Some(invoice) = self.store.find::<SalesInvoice>(&invoice_name).await? else {
            return Ok(Outcome::clean(PaymentCheck::NotReady {
                reason: format!("sales invoice {invoice_name} not found"),
            }));
        };
        if invoice.docstatus != DocStatus::Submitted {
            return Ok(Outcome::clean(PaymentCheck::NotReady {
                reason: format!("sales invoice {invoice_name} is {}", invoice.docstatus),
            }));
        }
        if !invoice.is_paid() {
            return Ok(Outcome::clean(PaymentCheck::PendingPayment {
                invoice: invoice.name,
                outstanding_amount: invoice.outstanding_amount,
            }));
        }

        let mut effects = SideEffects::new();
        self.complete(&mut booking, &mut effects).await?;
        Ok(effects.finish(PaymentCheck::Completed))
    }

    /// Payment hook: re-checks every returned booking billed by an invoice the
    /// payment references.
    pub async fn on_payment_confirmed(&self, payment: &PaymentEntry) -> Result<Outcome<Vec<BookingCheck>>, WorkflowError> {
        info!(payment = %payment.name, "Payment entry received");
        let mut effects = SideEffects::new();
        let mut checks = Vec::new();
        for invoice in payment.invoice_references() {
            let outcome = self.on_invoice_updated(invoice).await?;
            checks.extend(outcome.value);
            effects.carry(outcome.warnings);
        }
        Ok(effects.finish(checks))
    }

    /// Invoice hook: re-checks every returned booking billed by `invoice`.
    pub async fn on_invoice_updated(&self, invoice: &str) -> Result<Outcome<Vec<BookingCheck>>, WorkflowError> {
        let filters = [
            Filter::eq("sales_invoice", invoice),
            Filter::eq("status", BookingStatus::Returned),
        ];
        let bookings = self.store.list::<RentalBooking>(&filters).await?;

        let mut effects = SideEffects::new();
        let mut checks = Vec::with_capacity(bookings.len());
        for booking in bookings {
            let step = format!("complete booking {}", booking.name);
            if let Some(outcome) = effects.absorb(&step, self.check_and_complete_if_paid(&booking.name).await) {
                effects.carry(outcome.warnings);
                checks.push(BookingCheck {
                    booking: booking.name,
                    result: outcome.value,
                });
            }
        }
        Ok(effects.finish(checks))
    }
}
