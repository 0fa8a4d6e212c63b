use crate::documents::{InvoiceItem, RentalBooking, SalesInvoice};
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use num_traits::Zero;

/// Invoice lines for a booking: the rental itself, then one line per named
/// additional service. Services without a name are skipped.
pub fn invoice_items(booking: &RentalBooking, rental_item: &str) -> Vec<InvoiceItem> {
    let days = if booking.no_days > 0 { booking.no_days } else { 1 };
    let mut items = Vec::with_capacity(booking.additional_services.len() + 1);

    let period = match (booking.rental_start, booking.rental_end) {
        (Some(start), Some(end)) => format!(" from {start} to {end}"),
        _ => String::new(),
    };
    items.push(InvoiceItem {
        item_name: rental_item.to_string(),
        description: format!("Rental of {} for booking {}{}", booking.vehicle, booking.name, period),
        qty: days,
        rate: booking.rate_per_day.clone(),
        amount: BigDecimal::from(days) * &booking.rate_per_day,
    });

    for service in &booking.additional_services {
        let Some(service_name) = service.service_name.as_deref().filter(|n| !n.trim().is_empty()) else {
            continue;
        };
        items.push(InvoiceItem {
            item_name: service_name.to_string(),
            description: format!("{service_name} for booking {}", booking.name),
            qty: service.quantity,
            rate: service.rate.clone(),
            amount: service.line_total(),
        });
    }
    items
}

pub fn invoice_total(items: &[InvoiceItem]) -> BigDecimal {
    items.iter().fold(BigDecimal::zero(), |acc, item| acc + &item.amount)
}

/// Draft invoice for a returned booking; the accounting system submits it and
/// settles the outstanding amount.
pub fn draft_invoice(booking: &RentalBooking, rental_item: &str, posting_date: NaiveDate) -> SalesInvoice {
    let items = invoice_items(booking, rental_item);
    let grand_total = invoice_total(&items);
    SalesInvoice {
        customer: booking.customer.clone(),
        rental_booking: booking.name.clone(),
        posting_date: Some(posting_date),
        outstanding_amount: grand_total.clone(),
        grand_total,
        items,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::AdditionalService;

    fn booking() -> RentalBooking {
        RentalBooking {
            name: "RB-2025-06-0001".into(),
            customer: "Jane Roe".into(),
            vehicle: "KA-01-1234".into(),
            no_days: 3,
            rate_per_day: BigDecimal::from(100),
            additional_services: vec![AdditionalService {
                service_name: Some("Child seat".into()),
                quantity: 2,
                rate: BigDecimal::from(20),
                total: None,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn rental_and_service_lines_sum_to_total() {
        let items = invoice_items(&booking(), "Vehicle Rental");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].item_name, "Vehicle Rental");
        assert_eq!(items[0].qty, 3);
        assert_eq!(items[0].amount, BigDecimal::from(300));
        assert_eq!(items[1].amount, BigDecimal::from(40));
        assert_eq!(invoice_total(&items), BigDecimal::from(340));
    }

    #[test]
    fn unnamed_services_are_skipped() {
        let mut b = booking();
        b.additional_services.push(AdditionalService {
            service_name: None,
            quantity: 1,
            rate: BigDecimal::from(50),
            total: None,
        });
        b.additional_services.push(AdditionalService {
            service_name: Some("  ".into()),
            quantity: 1,
            rate: BigDecimal::from(50),
            total: None,
        });
        assert_eq!(invoice_items(&b, "Vehicle Rental").len(), 2);
    }

    #[test]
    fn recorded_total_wins_over_quantity_times_rate() {
        let mut b = booking();
        b.additional_services[0].total = Some(BigDecimal::from(35));
        let items = invoice_items(&b, "Vehicle Rental");
        assert_eq!(items[1].amount, BigDecimal::from(35));
    }

    #[test]
    fn zero_days_bills_one_day() {
        let mut b = booking();
        b.no_days = 0;
        b.additional_services.clear();
        let items = invoice_items(&b, "Vehicle Rental");
        assert_eq!(items[0].qty, 1);
        assert_eq!(items[0].amount, BigDecimal::from(100));
    }

    #[test]
    fn draft_invoice_is_fully_outstanding() {
        let posting = NaiveDate::from_ymd_opt(2025, 6, 13).unwrap();
        let invoice = draft_invoice(&booking(), "Vehicle Rental", posting);
        assert_eq!(invoice.grand_total, BigDecimal::from(340));
        assert_eq!(invoice.outstanding_amount, invoice.grand_total);
        assert_eq!(invoice.rental_booking, "RB-2025-06-0001");
        assert!(!invoice.is_paid());
    }
}
