use crate::error::WorkflowError;
use crate::store::WriteMode;
use crate::workflow::{Outcome, RentalWorkflow, SideEffects};
use chrono::Utc;
use rental_shared::{
    contract_status_for, ContractStatus, DocStatus, Document, RentalBooking, RentalContract, RuleViolation, Vehicle,
};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub enum ContractCreation {
    Created(RentalContract),
    /// An open contract already covers the booking.
    Exists(String),
}

impl RentalWorkflow {
    /// Drafts a contract from a submitted booking. Terms are left blank; a
    /// completed booking's outcome is carried over.
    pub async fn create_contract_from_booking(&self, booking: &str) -> Result<ContractCreation, WorkflowError> {
        let booking: RentalBooking = self.require(booking).await?;
        if booking.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: RentalBooking::DOCTYPE,
                name: booking.name,
            }
            .into());
        }
        if let Some(existing) = self.open_linked::<RentalContract>(&booking.name).await?.into_iter().next() {
            return Ok(ContractCreation::Exists(existing.name));
        }

        let vehicle = if booking.vehicle.is_empty() {
            None
        } else {
            self.store.find::<Vehicle>(&booking.vehicle).await?
        };
        let mut contract = RentalContract::from_booking(&booking, vehicle.as_ref(), Utc::now().date_naive());
        if let Some(outcome) = contract_status_for(booking.status) {
            contract.contract_status = outcome;
        }
        let contract = self.store.insert(&contract).await?;
        info!(contract = %contract.name, booking = %booking.name, "Rental contract created");
        Ok(ContractCreation::Created(contract))
    }

    pub async fn update_contract_terms(&self, name: &str, legal_and_terms: String) -> Result<RentalContract, WorkflowError> {
        let mut contract: RentalContract = self.require(name).await?;
        if contract.docstatus != DocStatus::Draft {
            return Err(RuleViolation::NotDraft {
                doctype: RentalContract::DOCTYPE,
                name: contract.name,
                docstatus: contract.docstatus,
            }
            .into());
        }
        contract.legal_and_terms = legal_and_terms;
        self.store.save(&contract, WriteMode::Normal).await?;
        info!(contract = %contract.name, "Contract terms updated");
        Ok(contract)
    }

    /// Activates a contract and links it from its booking. A contract of a
    /// completed booking is submitted as Completed.
    pub async fn submit_contract(&self, name: &str) -> Result<Outcome<RentalContract>, WorkflowError> {
        let mut contract: RentalContract = self.require(name).await?;
        if contract.docstatus != DocStatus::Draft {
            return Err(RuleViolation::NotDraft {
                doctype: RentalContract::DOCTYPE,
                name: contract.name,
                docstatus: contract.docstatus,
            }
            .into());
        }
        if contract.legal_and_terms.trim().is_empty() {
            return Err(RuleViolation::LegalTermsMissing { contract: contract.name }.into());
        }

        let booking: RentalBooking = self.require(&contract.rental_booking).await?;
        if booking.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: RentalBooking::DOCTYPE,
                name: booking.name,
            }
            .into());
        }
        let other = self
            .open_linked::<RentalContract>(&booking.name)
            .await?
            .into_iter()
            .find(|other| other.name != contract.name);
        if let Some(other) = other {
            return Err(RuleViolation::ContractExists {
                booking: booking.name,
                contract: other.name,
            }
            .into());
        }

        // a booking that already reached its outcome keeps it on the contract
        contract.contract_status = contract_status_for(booking.status).unwrap_or(ContractStatus::Active);
        self.store.submit(&mut contract).await?;
        info!(contract = %contract.name, booking = %booking.name, to = %contract.contract_status, "Rental contract submitted");

        let mut effects = SideEffects::new();
        let link = self
            .store
            .set_value::<RentalBooking>(&booking.name, "rental_contract", &contract.name, WriteMode::AfterSubmit)
            .await
            .map_err(WorkflowError::from);
        effects.absorb("link contract to booking", link);
        Ok(effects.finish(contract))
    }

    /// Terminates a contract and clears the booking's reference to it.
    pub async fn cancel_contract(&self, name: &str) -> Result<Outcome<RentalContract>, WorkflowError> {
        let mut contract: RentalContract = self.require(name).await?;
        if contract.docstatus != DocStatus::Submitted {
            return Err(RuleViolation::NotSubmitted {
                doctype: RentalContract::DOCTYPE,
                name: contract.name,
            }
            .into());
        }

        contract.contract_status = ContractStatus::Terminated;
        self.store.cancel(&mut contract).await?;
        info!(contract = %contract.name, booking = %contract.rental_booking, "Rental contract cancelled");

        let mut effects = SideEffects::new();
        effects.absorb("unlink contract from booking", self.unlink_contract(&contract).await);
        Ok(effects.finish(contract))
    }

    async fn unlink_contract(&self, contract: &RentalContract) -> Result<(), WorkflowError> {
        let Some(booking) = self.store.find::<RentalBooking>(&contract.rental_booking).await? else {
            return Ok(());
        };
        if booking.rental_contract.as_deref() != Some(contract.name.as_str()) {
            return Ok(());
        }
        self.store
            .set_value::<RentalBooking>(&booking.name, "rental_contract", Option::<String>::None, WriteMode::AfterSubmit)
            .await?;
        info!(contract = %contract.name, booking = %booking.name, "Contract unlinked from booking");
        Ok(())
    }

    /// Mirrors a Completed or Cancelled booking onto its contract. Returns the
    /// contract that was brought in line, if the booking has one.
    pub(crate) async fn push_contract_status(&self, booking: &RentalBooking) -> Result<Option<String>, WorkflowError> {
        let Some(target) = contract_status_for(booking.status) else {
            return Ok(None);
        };
        let contract = match &booking.rental_contract {
            Some(name) => self.store.find::<RentalContract>(name).await?,
            None => self.open_linked::<RentalContract>(&booking.name).await?.into_iter().next(),
        };
        let Some(mut contract) = contract else {
            return Ok(None);
        };

        if contract.contract_status != target {
            let from = contract.contract_status;
            contract.contract_status = target;
            self.store.save(&contract, WriteMode::AfterSubmit).await?;
            info!(contract = %contract.name, booking = %booking.name, %from, to = %target, "Contract status updated");
        }
        Ok(Some(contract.name))
    }
}
