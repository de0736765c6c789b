use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RecordResult;
use crate::models::{Identity, PromotionResult};
use crate::semester::{format_semester, parse_semester, transition_for, Transition};
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct PromotionFailure {
    pub identity_id: Uuid,
    pub transition: Transition,
    pub error: String,
}

/// Running state of one sweep over the cohort.
#[derive(Debug, Default)]
pub struct CohortSweep {
    pub result: PromotionResult,
    pub skipped: usize,
    pub failures: Vec<PromotionFailure>,
}

impl CohortSweep {
    fn record(&mut self, identity_id: Uuid, transition: Transition, outcome: anyhow::Result<()>) {
        match (outcome, transition) {
            (Ok(()), Transition::Advance { .. }) => self.result.promoted += 1,
            (Ok(()), Transition::Graduate) => self.result.graduated += 1,
            (Err(err), _) => {
                self.failures.push(PromotionFailure {
                    identity_id,
                    transition,
                    error: err.to_string(),
                });
            }
        }
    }
}

async fn apply(
    store: &dyn RecordStore,
    identity: &Identity,
    transition: Transition,
) -> anyhow::Result<()> {
    match transition {
        Transition::Advance { to } => {
            store
                .update_identity_semester(identity.id, &format_semester(to))
                .await
        }
        Transition::Graduate => store.delete_identity(identity.id).await,
    }
}

/// Advances every student one semester and removes those past the terminal one.
/// Individual failures are collected rather than aborting the sweep; only a failure
/// to list the directory is returned as an error.
pub async fn sweep_cohort(store: &dyn RecordStore) -> RecordResult<CohortSweep> {
    let identities = store.list_all_student_identities().await?;
    info!(count = identities.len(), "starting cohort promotion");

    let mut sweep = CohortSweep::default();
    for identity in identities.iter().filter(|identity| identity.is_student()) {
        let Some(semester) = identity.semester_value().and_then(parse_semester) else {
            debug!(identity_id = %identity.id, "skipping identity without a usable semester");
            sweep.skipped += 1;
            continue;
        };

        let transition = transition_for(semester);
        let outcome = apply(store, identity, transition).await;
        sweep.record(identity.id, transition, outcome);
    }

    for failure in &sweep.failures {
        warn!(
            identity_id = %failure.identity_id,
            transition = ?failure.transition,
            error = %failure.error,
            "promotion step failed"
        );
    }

    info!(
        promoted = sweep.result.promoted,
        graduated = sweep.result.graduated,
        skipped = sweep.skipped,
        failed = sweep.failures.len(),
        "cohort promotion complete"
    );
    Ok(sweep)
}

pub async fn promote_cohort(store: &dyn RecordStore) -> RecordResult<PromotionResult> {
    Ok(sweep_cohort(store).await?.result)
}
