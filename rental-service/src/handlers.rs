use crate::booking::BookingInput;
use crate::contract::ContractCreation;
use crate::error::{StoreError, WorkflowError};
use crate::inspection::{CompletedInspection, InspectionApplied, InspectionDetails};
use crate::invoice::{BookingCheck, InvoiceCreation, PaymentCheck};
use crate::workflow::{Outcome, RentalWorkflow};
use chrono::NaiveDate;
use rental_shared::{status_flow, InspectionType, MethodReply, PaymentEntry, ReplyStatus};
use serde::Deserialize;
use tracing::{error, info};

/// A method call as posted to `/api/method/{method}`: the method name picks
/// the variant and the JSON body carries its arguments.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
pub enum MethodCall {
    CompletePreInspection {
        booking: String,
        notes: Option<String>,
    },
    CompletePostInspection {
        booking: String,
        notes: Option<String>,
        fuel_level: Option<String>,
        condition_summary: Option<String>,
    },
    CreateInspection {
        booking: String,
        inspection_type: InspectionType,
    },
    UpdateStatusFromInspection {
        booking: String,
        inspection_type: InspectionType,
        inspection: String,
    },
    GetBookingSummary {
        booking: String,
    },
    GetStatusFlow {},
    GetVehicleAvailability {
        vehicle: String,
        #[serde(alias = "start_date")]
        start: NaiveDate,
        #[serde(alias = "end_date")]
        end: NaiveDate,
        exclude_booking: Option<String>,
    },
    CreateSalesInvoiceFromBooking {
        booking: String,
    },
    CheckAndCompleteIfPaid {
        booking: String,
    },
    CreateContractFromBooking {
        booking: String,
    },
    SaveBooking(BookingInput),
    SubmitBooking {
        booking: String,
    },
    CancelBooking {
        booking: String,
    },
    CompleteRental {
        booking: String,
    },
    SubmitInspection {
        inspection: String,
    },
    CancelInspection {
        inspection: String,
    },
    UpdateContractTerms {
        contract: String,
        legal_and_terms: String,
    },
    SubmitContract {
        contract: String,
    },
    CancelContract {
        contract: String,
    },
    SyncVehicleStatus {
        booking: String,
    },
}

impl MethodCall {
    /// Builds a call from the method name and its argument object.
    pub fn parse(method: &str, args: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(serde_json::json!({ "method": method, "args": args }))
    }
}

#[derive(Clone)]
pub struct MethodHandler {
    workflow: RentalWorkflow,
}

impl MethodHandler {
    pub fn new(workflow: RentalWorkflow) -> Self {
        Self { workflow }
    }

    pub fn workflow(&self) -> &RentalWorkflow {
        &self.workflow
    }

    /// Business outcomes, rejections included, come back as replies. Only
    /// store outages are errors.
    pub async fn handle(&self, call: MethodCall) -> Result<MethodReply, StoreError> {
        let result = self.dispatch(call).await;
        self.settle(result)
    }

    pub async fn handle_payment_entry(&self, payment: PaymentEntry) -> Result<MethodReply, StoreError> {
        let result = self
            .workflow
            .on_payment_confirmed(&payment)
            .await
            .map(|outcome| checks_reply(format!("Payment entry {} processed", payment.name), outcome));
        self.settle(result)
    }

    pub async fn handle_invoice_update(&self, invoice: &str) -> Result<MethodReply, StoreError> {
        let result = self
            .workflow
            .on_invoice_updated(invoice)
            .await
            .map(|outcome| checks_reply(format!("Sales invoice {invoice} processed"), outcome));
        self.settle(result)
    }

    fn settle(&self, result: Result<MethodReply, WorkflowError>) -> Result<MethodReply, StoreError> {
        match result {
            Ok(reply) => Ok(reply),
            Err(WorkflowError::Rule(violation)) => {
                info!(code = violation.code(), "Request rejected: {}", violation);
                Ok(MethodReply::rejected(&violation))
            }
            Err(WorkflowError::Store(err)) if !err.is_outage() => {
                info!(code = err.code(), "Store refused write: {}", err);
                Ok(MethodReply::failed(err.code(), err.to_string()))
            }
            Err(WorkflowError::Store(err)) => {
                error!("Store failure: {}", err);
                Err(err)
            }
        }
    }

    async fn dispatch(&self, call: MethodCall) -> Result<MethodReply, WorkflowError> {
        let workflow = &self.workflow;
        let reply = match call {
            MethodCall::CompletePreInspection { booking, notes } => {
                let outcome = workflow.complete_pre_inspection(&booking, notes).await?;
                completed_inspection_reply("Pre-inspection completed successfully", outcome)
            }
            MethodCall::CompletePostInspection {
                booking,
                notes,
                fuel_level,
                condition_summary,
            } => {
                let details = InspectionDetails {
                    notes,
                    fuel_level,
                    condition_summary,
                };
                let outcome = workflow.complete_post_inspection(&booking, details).await?;
                completed_inspection_reply("Post-inspection completed successfully", outcome)
            }
            MethodCall::CreateInspection {
                booking,
                inspection_type,
            } => {
                let inspection = workflow
                    .create_inspection(&booking, inspection_type, InspectionDetails::default())
                    .await?;
                MethodReply::success(format!("{} {} created", inspection_type, inspection.name))
                    .with("inspection_name", &inspection.name)
                    .with("inspection", &inspection)
            }
            MethodCall::UpdateStatusFromInspection {
                booking,
                inspection_type,
                inspection,
            } => {
                let outcome = workflow
                    .update_status_from_inspection(&booking, inspection_type, &inspection)
                    .await?;
                applied_reply(outcome)
            }
            MethodCall::GetBookingSummary { booking } => {
                let summary = workflow.booking_summary(&booking).await?;
                MethodReply::success(format!("Summary of rental booking {booking}")).with("summary", summary)
            }
            MethodCall::GetStatusFlow {} => {
                MethodReply::success("Rental booking status flow").with("flow", status_flow())
            }
            MethodCall::GetVehicleAvailability {
                vehicle,
                start,
                end,
                exclude_booking,
            } => {
                let availability = workflow
                    .vehicle_availability(&vehicle, start, end, exclude_booking.as_deref())
                    .await?;
                let message = if availability.available {
                    format!("Vehicle {vehicle} is available from {start} to {end}")
                } else {
                    format!(
                        "Vehicle {vehicle} has {} conflicting booking(s) from {start} to {end}",
                        availability.conflicts.len()
                    )
                };
                MethodReply::success(message)
                    .with("available", availability.available)
                    .with("conflicts", &availability.conflicts)
            }
            MethodCall::CreateSalesInvoiceFromBooking { booking } => {
                match workflow.create_sales_invoice_from_booking(&booking).await? {
                    InvoiceCreation::Created(invoice) => {
                        MethodReply::success(format!("Sales invoice {} created for booking {booking}", invoice.name))
                            .with("sales_invoice", &invoice.name)
                            .with("grand_total", &invoice.grand_total)
                    }
                    InvoiceCreation::Relinked(invoice) => MethodReply::new(
                        ReplyStatus::Exists,
                        format!("Sales invoice {} already exists for booking {booking}", invoice.name),
                    )
                    .with("sales_invoice", &invoice.name)
                    .with("grand_total", &invoice.grand_total),
                }
            }
            MethodCall::CheckAndCompleteIfPaid { booking } => {
                let outcome = workflow.check_and_complete_if_paid(&booking).await?;
                payment_check_reply(&booking, outcome.value).with_warnings(outcome.warnings)
            }
            MethodCall::CreateContractFromBooking { booking } => {
                match workflow.create_contract_from_booking(&booking).await? {
                    ContractCreation::Created(contract) => {
                        MethodReply::success(format!("Rental contract {} created successfully", contract.name))
                            .with("contract_name", &contract.name)
                    }
                    ContractCreation::Exists(contract) => MethodReply::new(
                        ReplyStatus::Exists,
                        format!("Contract {contract} already exists for this rental booking"),
                    )
                    .with("contract_name", contract),
                }
            }
            MethodCall::SaveBooking(input) => {
                let booking = workflow.save_booking(input).await?;
                MethodReply::success(format!("Rental booking {} saved", booking.name))
                    .with("booking_name", &booking.name)
                    .with("booking", &booking)
            }
            MethodCall::SubmitBooking { booking } => {
                let outcome = workflow.submit_booking(&booking).await?;
                MethodReply::success(format!("Rental booking {booking} submitted"))
                    .with("new_status", outcome.value.status)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::CancelBooking { booking } => {
                let outcome = workflow.cancel_booking(&booking).await?;
                MethodReply::success(format!("Rental booking {booking} cancelled"))
                    .with("new_status", outcome.value.status)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::CompleteRental { booking } => {
                let outcome = workflow.complete_rental(&booking).await?;
                MethodReply::success("Rental booking completed successfully")
                    .with("new_status", outcome.value.status)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::SubmitInspection { inspection } => {
                let outcome = workflow.submit_inspection(&inspection).await?;
                applied_reply(outcome)
            }
            MethodCall::CancelInspection { inspection } => {
                let outcome = workflow.cancel_inspection(&inspection).await?;
                MethodReply::success(format!("Inspection {inspection} cancelled"))
                    .with("rental_booking", &outcome.value.rental_booking)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::UpdateContractTerms {
                contract,
                legal_and_terms,
            } => {
                let contract = workflow.update_contract_terms(&contract, legal_and_terms).await?;
                MethodReply::success(format!("Terms of contract {} updated", contract.name))
                    .with("contract_name", &contract.name)
            }
            MethodCall::SubmitContract { contract } => {
                let outcome = workflow.submit_contract(&contract).await?;
                MethodReply::success(format!("Rental contract {contract} submitted"))
                    .with("contract_status", outcome.value.contract_status)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::CancelContract { contract } => {
                let outcome = workflow.cancel_contract(&contract).await?;
                MethodReply::success(format!("Rental contract {contract} cancelled"))
                    .with("contract_status", outcome.value.contract_status)
                    .with_warnings(outcome.warnings)
            }
            MethodCall::SyncVehicleStatus { booking } => {
                let sync = workflow.refresh_vehicle_status(&booking).await?;
                MethodReply::success(format!("Vehicle status checked for booking {booking}")).with("vehicle_sync", sync)
            }
        };
        Ok(reply)
    }
}

fn completed_inspection_reply(message: &str, outcome: Outcome<CompletedInspection>) -> MethodReply {
    MethodReply::success(message)
        .with("new_status", outcome.value.booking_status)
        .with("inspection_name", &outcome.value.inspection.name)
        .with_warnings(outcome.warnings)
}

fn applied_reply(outcome: Outcome<InspectionApplied>) -> MethodReply {
    let reply = match outcome.value {
        InspectionApplied::Applied { booking, status } => {
            MethodReply::success(format!("Rental booking {booking} status updated to: {status}"))
                .with("new_status", status)
        }
        InspectionApplied::AlreadyApplied { booking, status } => MethodReply::new(
            ReplyStatus::AlreadyApplied,
            format!("Rental booking {booking} already reflects this inspection"),
        )
        .with("new_status", status),
    };
    reply.with_warnings(outcome.warnings)
}

fn payment_check_reply(booking: &str, check: PaymentCheck) -> MethodReply {
    match check {
        PaymentCheck::Completed => {
            MethodReply::success(format!("Rental booking {booking} completed after payment")).with("new_status", "Completed")
        }
        PaymentCheck::AlreadyCompleted => MethodReply::new(
            ReplyStatus::AlreadyCompleted,
            format!("Rental booking {booking} is already completed"),
        ),
        PaymentCheck::PendingPayment {
            invoice,
            outstanding_amount,
        } => MethodReply::new(
            ReplyStatus::PendingPayment,
            format!("Sales invoice {invoice} still has {outstanding_amount} outstanding"),
        )
        .with("sales_invoice", invoice)
        .with("outstanding_amount", outstanding_amount),
        PaymentCheck::NotReady { reason } => MethodReply::new(ReplyStatus::NotReady, reason),
    }
}

fn checks_reply(message: String, outcome: Outcome<Vec<BookingCheck>>) -> MethodReply {
    MethodReply::success(message)
        .with("bookings", &outcome.value)
        .with_warnings(outcome.warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn method_name_selects_the_call() {
        let call = MethodCall::parse("complete_pre_inspection", json!({"booking": "RB-2025-06-0001"})).unwrap();
        assert!(matches!(
            call,
            MethodCall::CompletePreInspection { booking, notes: None } if booking == "RB-2025-06-0001"
        ));
    }

    #[test]
    fn availability_accepts_date_aliases() {
        let call = MethodCall::parse(
            "get_vehicle_availability",
            json!({"vehicle": "KA-01-1234", "start_date": "2025-07-04", "end_date": "2025-07-10"}),
        )
        .unwrap();
        let MethodCall::GetVehicleAvailability { start, exclude_booking, .. } = call else {
            panic!("wrong variant");
        };
        assert_eq!(start, NaiveDate::from_ymd_opt(2025, 7, 4).unwrap());
        assert_eq!(exclude_booking, None);
    }

    #[test]
    fn status_flow_takes_no_arguments() {
        assert!(matches!(
            MethodCall::parse("get_status_flow", json!({})).unwrap(),
            MethodCall::GetStatusFlow {}
        ));
    }

    #[test]
    fn unknown_method_and_bad_arguments_fail_to_parse() {
        assert!(MethodCall::parse("drop_everything", json!({})).is_err());
        assert!(MethodCall::parse("create_inspection", json!({"booking": "RB-2025-06-0001"})).is_err());
        assert!(MethodCall::parse(
            "create_inspection",
            json!({"booking": "RB-2025-06-0001", "inspection_type": "Mid-Inspection"})
        )
        .is_err());
    }

    #[test]
    fn payment_checks_map_to_distinct_statuses() {
        assert_eq!(
            payment_check_reply("RB-1", PaymentCheck::AlreadyCompleted).status,
            ReplyStatus::AlreadyCompleted
        );
        let reason = "booking RB-1 has no sales invoice".to_string();
        let reply = payment_check_reply("RB-1", PaymentCheck::NotReady { reason: reason.clone() });
        assert_eq!(reply.status, ReplyStatus::NotReady);
        assert_eq!(reply.message, reason);
    }
}
