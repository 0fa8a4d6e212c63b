use serde::{Deserialize, Serialize};
use std::fmt;

/// Document lifecycle owned by the store: draft, submitted (read-only unless
/// overridden) and cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    pub fn as_i16(self) -> i16 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }

    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(DocStatus::Draft),
            1 => Some(DocStatus::Submitted),
            2 => Some(DocStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocStatus::Draft => "draft",
            DocStatus::Submitted => "submitted",
            DocStatus::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BookingStatus {
    #[default]
    Draft,
    Confirmed,
    Out,
    Returned,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Draft,
        BookingStatus::Confirmed,
        BookingStatus::Out,
        BookingStatus::Returned,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Draft => "Draft",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Out => "Out",
            BookingStatus::Returned => "Returned",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// List-view colour used by the desk.
    pub fn indicator(self) -> &'static str {
        match self {
            BookingStatus::Draft | BookingStatus::Cancelled => "red",
            BookingStatus::Confirmed => "blue",
            BookingStatus::Out => "orange",
            BookingStatus::Returned => "purple",
            BookingStatus::Completed => "green",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            BookingStatus::Draft => "Initial state",
            BookingStatus::Confirmed => "After submission",
            BookingStatus::Out => "After pre-inspection",
            BookingStatus::Returned => "After post-inspection",
            BookingStatus::Completed => "After the invoice is paid or the rental is completed manually",
            BookingStatus::Cancelled => "If cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VehicleStatus {
    #[default]
    Available,
    Booked,
    Rented,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VehicleStatus::Available => "Available",
            VehicleStatus::Booked => "Booked",
            VehicleStatus::Rented => "Rented",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InspectionType {
    #[serde(rename = "Pre-Inspection")]
    PreInspection,
    #[serde(rename = "Post-Inspection")]
    PostInspection,
}

impl InspectionType {
    pub fn naming_prefix(self) -> &'static str {
        match self {
            InspectionType::PreInspection => "PI",
            InspectionType::PostInspection => "PTI",
        }
    }
}

impl fmt::Display for InspectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InspectionType::PreInspection => "Pre-Inspection",
            InspectionType::PostInspection => "Post-Inspection",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InspectionStatus {
    #[default]
    Draft,
    Submitted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ContractStatus {
    #[default]
    Draft,
    Active,
    Completed,
    Terminated,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ContractStatus::Draft => "Draft",
            ContractStatus::Active => "Active",
            ContractStatus::Completed => "Completed",
            ContractStatus::Terminated => "Terminated",
        };
        f.write_str(label)
    }
}

/// Vehicle availability implied by a booking status. `None` means the booking
/// status carries no vehicle change: a draft has not reserved anything yet and
/// a returned vehicle stays rented until the rental is completed or cancelled.
pub fn vehicle_status_for(status: BookingStatus) -> Option<VehicleStatus> {
    match status {
        BookingStatus::Draft | BookingStatus::Returned => None,
        BookingStatus::Confirmed => Some(VehicleStatus::Booked),
        BookingStatus::Out => Some(VehicleStatus::Rented),
        BookingStatus::Completed | BookingStatus::Cancelled => Some(VehicleStatus::Available),
    }
}

/// Contract status pushed from the booking. Only the two outcomes propagate.
pub fn contract_status_for(status: BookingStatus) -> Option<ContractStatus> {
    match status {
        BookingStatus::Completed => Some(ContractStatus::Completed),
        BookingStatus::Cancelled => Some(ContractStatus::Terminated),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStep {
    pub status: BookingStatus,
    pub description: &'static str,
    pub indicator: &'static str,
    pub vehicle_status: Option<VehicleStatus>,
    pub terminal: bool,
}

pub fn status_flow() -> Vec<StatusStep> {
    BookingStatus::ALL
        .iter()
        .map(|status| StatusStep {
            status: *status,
            description: status.description(),
            indicator: status.indicator(),
            vehicle_status: vehicle_status_for(*status),
            terminal: status.is_terminal(),
        })
        .collect()
}
