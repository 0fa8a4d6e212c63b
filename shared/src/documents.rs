use crate::rules::RuleViolation;
use crate::status::{BookingStatus, ContractStatus, DocStatus, InspectionStatus, InspectionType, VehicleStatus};
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use num_traits::Zero;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record persisted by the entity store. The store owns `name` and
/// `docstatus`; everything else travels as the serialized body.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    const DOCTYPE: &'static str;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
    fn docstatus(&self) -> DocStatus;
    fn set_docstatus(&mut self, docstatus: DocStatus);

    /// Naming series prefix used when the store assigns a name.
    fn naming_prefix(&self) -> &'static str;
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Vehicle {
    pub name: String,
    pub docstatus: DocStatus,
    pub make: String,
    pub model: String,
    pub license_plate: String,
    pub rate_per_day: BigDecimal,
    pub status: VehicleStatus,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdditionalService {
    pub service_name: Option<String>,
    pub quantity: i64,
    pub rate: BigDecimal,
    /// Recorded line total; `quantity * rate` applies when absent.
    pub total: Option<BigDecimal>,
}

impl AdditionalService {
    pub fn line_total(&self) -> BigDecimal {
        match &self.total {
            Some(total) => total.clone(),
            None => BigDecimal::from(self.quantity) * &self.rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalBooking {
    pub name: String,
    pub docstatus: DocStatus,
    pub customer: String,
    pub vehicle: String,
    pub rental_start: Option<NaiveDate>,
    pub rental_end: Option<NaiveDate>,
    pub no_days: i64,
    pub rate_per_day: BigDecimal,
    pub amount: BigDecimal,
    pub status: BookingStatus,
    pub pre_inspection: Option<String>,
    pub post_inspection: Option<String>,
    pub rental_contract: Option<String>,
    pub sales_invoice: Option<String>,
    pub additional_services: Vec<AdditionalService>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl RentalBooking {
    /// Runs before every persistence of a booking: derives `no_days`, service
    /// quantities and `amount`, and rejects an empty or inverted date range.
    pub fn validate(&mut self) -> Result<(), RuleViolation> {
        if let (Some(start), Some(end)) = (self.rental_start, self.rental_end) {
            let days = (end - start).num_days();
            if days <= 0 {
                return Err(RuleViolation::InvalidDateRange { start, end });
            }
            self.no_days = days;
        }

        for service in &mut self.additional_services {
            if service.rate < BigDecimal::zero() {
                return Err(RuleViolation::NegativeRate {
                    service: service.service_name.clone().unwrap_or_default(),
                });
            }
            if service.quantity < 0 {
                return Err(RuleViolation::NegativeQuantity {
                    service: service.service_name.clone().unwrap_or_default(),
                });
            }
            if service.quantity == 0 {
                service.quantity = 1;
            }
        }

        self.amount = self.rental_total() + self.services_total();
        Ok(())
    }

    /// Extra requirements for confirming a booking.
    pub fn validate_for_submit(&mut self) -> Result<(), RuleViolation> {
        if self.customer.trim().is_empty() {
            return Err(RuleViolation::MissingField { field: "customer" });
        }
        if self.vehicle.trim().is_empty() {
            return Err(RuleViolation::MissingField { field: "vehicle" });
        }
        if self.rental_start.is_none() {
            return Err(RuleViolation::MissingField { field: "rental_start" });
        }
        if self.rental_end.is_none() {
            return Err(RuleViolation::MissingField { field: "rental_end" });
        }
        self.validate()
    }

    pub fn rental_total(&self) -> BigDecimal {
        BigDecimal::from(self.no_days) * &self.rate_per_day
    }

    pub fn services_total(&self) -> BigDecimal {
        self.additional_services
            .iter()
            .fold(BigDecimal::zero(), |acc, service| acc + service.line_total())
    }

    /// Reference this booking holds for an inspection of `kind`.
    pub fn inspection_ref(&self, kind: InspectionType) -> Option<&String> {
        match kind {
            InspectionType::PreInspection => self.pre_inspection.as_ref(),
            InspectionType::PostInspection => self.post_inspection.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleInspection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub docstatus: DocStatus,
    pub rental_booking: String,
    pub inspection_type: InspectionType,
    #[serde(default)]
    pub vehicle: String,
    #[serde(default)]
    pub inspection_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: InspectionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub fuel_level: Option<String>,
    #[serde(default)]
    pub condition_summary: Option<String>,
}

impl VehicleInspection {
    pub fn new(rental_booking: &str, inspection_type: InspectionType) -> Self {
        Self {
            name: String::new(),
            docstatus: DocStatus::Draft,
            rental_booking: rental_booking.to_string(),
            inspection_type,
            vehicle: String::new(),
            inspection_date: None,
            status: InspectionStatus::Draft,
            notes: None,
            fuel_level: None,
            condition_summary: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RentalContract {
    pub name: String,
    pub docstatus: DocStatus,
    pub rental_booking: String,
    pub contract_status: ContractStatus,
    pub contract_date: Option<NaiveDate>,
    pub customer: String,
    pub vehicle: String,
    pub vehicle_make: String,
    pub vehicle_model: String,
    pub license_plate: String,
    pub rental_start_date: Option<NaiveDate>,
    pub rental_end_date: Option<NaiveDate>,
    pub rental_days: i64,
    pub rate_per_day: BigDecimal,
    pub total_amount: BigDecimal,
    pub additional_services: Vec<AdditionalService>,
    pub legal_and_terms: String,
}

impl RentalContract {
    /// Snapshot of the booking (and its vehicle, when loaded) taken at
    /// contract creation. Terms stay blank for manual entry.
    pub fn from_booking(booking: &RentalBooking, vehicle: Option<&Vehicle>, today: NaiveDate) -> Self {
        let mut contract = Self {
            rental_booking: booking.name.clone(),
            contract_status: ContractStatus::Draft,
            contract_date: Some(today),
            customer: booking.customer.clone(),
            vehicle: booking.vehicle.clone(),
            rental_start_date: booking.rental_start,
            rental_end_date: booking.rental_end,
            rental_days: booking.no_days,
            rate_per_day: booking.rate_per_day.clone(),
            total_amount: booking.amount.clone(),
            additional_services: booking.additional_services.clone(),
            ..Default::default()
        };
        if let Some(vehicle) = vehicle {
            contract.vehicle_make = vehicle.make.clone();
            contract.vehicle_model = vehicle.model.clone();
            contract.license_plate = vehicle.license_plate.clone();
        }
        contract
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceItem {
    pub item_name: String,
    pub description: String,
    pub qty: i64,
    pub rate: BigDecimal,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesInvoice {
    pub name: String,
    pub docstatus: DocStatus,
    pub customer: String,
    pub rental_booking: String,
    pub posting_date: Option<NaiveDate>,
    pub items: Vec<InvoiceItem>,
    pub grand_total: BigDecimal,
    pub outstanding_amount: BigDecimal,
}

impl SalesInvoice {
    pub fn is_paid(&self) -> bool {
        self.outstanding_amount <= BigDecimal::zero()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentReference {
    pub reference_doctype: String,
    pub reference_name: String,
}

/// Payment notification from the accounting system.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentEntry {
    pub name: String,
    pub references: Vec<PaymentReference>,
}

impl PaymentEntry {
    pub fn invoice_references(&self) -> impl Iterator<Item = &str> {
        self.references
            .iter()
            .filter(|reference| reference.reference_doctype == SalesInvoice::DOCTYPE)
            .map(|reference| reference.reference_name.as_str())
    }
}

impl Document for Vehicle {
    const DOCTYPE: &'static str = "Vehicle";

    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn docstatus(&self) -> DocStatus {
        self.docstatus
    }
    fn set_docstatus(&mut self, docstatus: DocStatus) {
        self.docstatus = docstatus;
    }
    fn naming_prefix(&self) -> &'static str {
        "VH"
    }
}

impl Document for RentalBooking {
    const DOCTYPE: &'static str = "Rental Booking";

    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn docstatus(&self) -> DocStatus {
        self.docstatus
    }
    fn set_docstatus(&mut self, docstatus: DocStatus) {
        self.docstatus = docstatus;
    }
    fn naming_prefix(&self) -> &'static str {
        "RB"
    }
}

impl Document for VehicleInspection {
    const DOCTYPE: &'static str = "Vehicle Inspection";

    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn docstatus(&self) -> DocStatus {
        self.docstatus
    }
    fn set_docstatus(&mut self, docstatus: DocStatus) {
        self.docstatus = docstatus;
    }
    fn naming_prefix(&self) -> &'static str {
        self.inspection_type.naming_prefix()
    }
}

impl Document for RentalContract {
    const DOCTYPE: &'static str = "Rental Contract";

    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn docstatus(&self) -> DocStatus {
        self.docstatus
    }
    fn set_docstatus(&mut self, docstatus: DocStatus) {
        self.docstatus = docstatus;
    }
    fn naming_prefix(&self) -> &'static str {
        "RC"
    }
}

impl Document for SalesInvoice {
    const DOCTYPE: &'static str = "Sales Invoice";

    fn name(&self) -> &str {
        &self.name
    }
    fn set_name(&mut self, name: String) {
        self.name = name;
    }
    fn docstatus(&self) -> DocStatus {
        self.docstatus
    }
    fn set_docstatus(&mut self, docstatus: DocStatus) {
        self.docstatus = docstatus;
    }
    fn naming_prefix(&self) -> &'static str {
        "SINV"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn dated(start: &str, end: &str) -> RentalBooking {
        RentalBooking {
            rental_start: Some(date(start)),
            rental_end: Some(date(end)),
            rate_per_day: BigDecimal::from(100),
            ..Default::default()
        }
    }

    #[test]
    fn no_days_is_the_date_difference() {
        let mut booking = dated("2025-06-10", "2025-06-12");
        booking.validate().unwrap();
        assert_eq!(booking.no_days, 2);
        assert_eq!(booking.amount, BigDecimal::from(200));
    }

    #[test]
    fn same_day_range_is_rejected() {
        let mut booking = dated("2025-06-10", "2025-06-10");
        let err = booking.validate().unwrap_err();
        assert_eq!(err.code(), "invalid_date_range");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut booking = dated("2025-06-12", "2025-06-10");
        assert!(booking.validate().is_err());
    }

    #[test]
    fn missing_dates_skip_day_count() {
        let mut booking = RentalBooking {
            rental_start: Some(date("2025-06-10")),
            ..Default::default()
        };
        booking.validate().unwrap();
        assert_eq!(booking.no_days, 0);
    }

    #[test]
    fn amount_includes_services() {
        let mut booking = dated("2025-06-10", "2025-06-13");
        booking.additional_services = vec![
            AdditionalService {
                service_name: Some("Child seat".into()),
                quantity: 2,
                rate: BigDecimal::from(20),
                total: None,
            },
            AdditionalService {
                service_name: Some("GPS".into()),
                quantity: 0,
                rate: BigDecimal::from(15),
                total: None,
            },
        ];
        booking.validate().unwrap();
        assert_eq!(booking.additional_services[1].quantity, 1);
        assert_eq!(booking.amount, BigDecimal::from(300 + 40 + 15));
    }

    #[test]
    fn negative_service_rate_is_rejected() {
        let mut booking = dated("2025-06-10", "2025-06-13");
        booking.additional_services.push(AdditionalService {
            service_name: Some("Discount".into()),
            quantity: 1,
            rate: BigDecimal::from(-5),
            total: None,
        });
        assert_eq!(booking.validate().unwrap_err().code(), "negative_rate");
    }

    #[test]
    fn negative_service_quantity_is_rejected() {
        let mut booking = dated("2025-06-10", "2025-06-13");
        booking.additional_services.push(AdditionalService {
            service_name: Some("Child seat".into()),
            quantity: -2,
            rate: BigDecimal::from(20),
            total: None,
        });
        assert_eq!(
            booking.validate().unwrap_err(),
            RuleViolation::NegativeQuantity {
                service: "Child seat".into()
            }
        );
        assert_eq!(booking.additional_services[0].quantity, -2);
    }

    #[test]
    fn submit_requires_customer_vehicle_and_dates() {
        let mut booking = dated("2025-06-10", "2025-06-12");
        assert_eq!(
            booking.validate_for_submit().unwrap_err(),
            RuleViolation::MissingField { field: "customer" }
        );
        booking.customer = "Jane Roe".into();
        booking.vehicle = "KA-01-1234".into();
        assert!(booking.validate_for_submit().is_ok());
    }

    #[test]
    fn contract_snapshot_copies_booking_and_vehicle() {
        let mut booking = dated("2025-06-10", "2025-06-12");
        booking.name = "RB-2025-06-0001".into();
        booking.customer = "Jane Roe".into();
        booking.vehicle = "KA-01-1234".into();
        booking.validate().unwrap();
        let vehicle = Vehicle {
            name: "KA-01-1234".into(),
            make: "Toyota".into(),
            model: "Corolla".into(),
            license_plate: "KA-01-1234".into(),
            ..Default::default()
        };

        let contract = RentalContract::from_booking(&booking, Some(&vehicle), date("2025-06-09"));
        assert_eq!(contract.rental_booking, "RB-2025-06-0001");
        assert_eq!(contract.rental_days, 2);
        assert_eq!(contract.total_amount, BigDecimal::from(200));
        assert_eq!(contract.vehicle_make, "Toyota");
        assert!(contract.legal_and_terms.is_empty());
        assert_eq!(contract.contract_status, ContractStatus::Draft);
    }

    #[test]
    fn payment_entry_filters_invoice_references() {
        let payment = PaymentEntry {
            name: "PE-0001".into(),
            references: vec![
                PaymentReference {
                    reference_doctype: "Sales Invoice".into(),
                    reference_name: "SINV-2025-06-0001".into(),
                },
                PaymentReference {
                    reference_doctype: "Journal Entry".into(),
                    reference_name: "JV-0009".into(),
                },
            ],
        };
        let refs: Vec<_> = payment.invoice_references().collect();
        assert_eq!(refs, vec!["SINV-2025-06-0001"]);
    }
}
