use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::features::sweeps::models::SweepKind;
use crate::shared::lifecycle::SweepReport;

/// Result of an on-demand sweep run
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepRunDto {
    pub sweep: SweepKind,
    pub report: SweepReport,
}
