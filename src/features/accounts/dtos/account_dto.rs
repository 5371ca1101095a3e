use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::features::accounts::models::AccountKind;
use crate::shared::lifecycle::TransitionOutcome;

/// Result of an account deletion request
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AccountTransitionDto {
    pub account_id: Uuid,
    pub kind: AccountKind,
    /// `applied` on the first deletion; repeated requests report
    /// `already_applied`
    pub outcome: TransitionOutcome,
}
