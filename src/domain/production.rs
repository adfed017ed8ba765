use super::ids::PartyId;
use crate::error::{EscrowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductionStatus {
    Confirmed,
    InProgress,
    QualityCheck,
    Completed,
}

impl fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductionStatus::Confirmed => "confirmed",
            ProductionStatus::InProgress => "in_progress",
            ProductionStatus::QualityCheck => "quality_check",
            ProductionStatus::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Physical-fulfillment sub-document. Linear machine
/// confirmed → in_progress → quality_check → completed; a failed quality
/// check cannot reach `Completed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionDetails {
    pub status: ProductionStatus,
    pub shop_id: PartyId,
    pub quality_check_passed: Option<bool>,
    pub confirmed_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProductionDetails {
    pub fn new(shop_id: PartyId) -> Self {
        Self {
            status: ProductionStatus::Confirmed,
            shop_id,
            quality_check_passed: None,
            confirmed_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        if self.status != ProductionStatus::Confirmed {
            return Err(EscrowError::invalid_state("start_production", self.status));
        }
        self.status = ProductionStatus::InProgress;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn record_quality_check(&mut self, passed: bool) -> Result<()> {
        if !matches!(
            self.status,
            ProductionStatus::InProgress | ProductionStatus::QualityCheck
        ) {
            return Err(EscrowError::invalid_state("quality_check", self.status));
        }
        self.status = ProductionStatus::QualityCheck;
        self.quality_check_passed = Some(passed);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<()> {
        if self.status != ProductionStatus::QualityCheck {
            return Err(EscrowError::invalid_state(
                "complete_production",
                self.status,
            ));
        }
        if self.quality_check_passed != Some(true) {
            return Err(EscrowError::invalid_state(
                "complete_production",
                "quality_check_failed",
            ));
        }
        self.status = ProductionStatus::Completed;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_completed(&self) -> bool {
        self.status == ProductionStatus::Completed
    }
}
