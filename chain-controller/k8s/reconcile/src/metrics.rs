use crate::{Outcome, PolicyWrite, Step};
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct Metrics {
    pub(crate) reconciles: Family<OutcomeLabels, Counter>,
    pub(crate) failures: Family<StepLabels, Counter>,
    pub(crate) restarts: Counter,
    pub(crate) policy_writes: Family<WriteLabels, Counter>,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
pub(crate) struct OutcomeLabels {
    pub(crate) outcome: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
pub(crate) struct StepLabels {
    pub(crate) step: &'static str,
}

#[derive(Clone, Hash, PartialEq, Eq, EncodeLabelSet, Debug)]
pub(crate) struct WriteLabels {
    pub(crate) op: &'static str,
}

// === impl Metrics ===

impl Metrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reconciles = Family::<OutcomeLabels, Counter>::default();
        reg.register(
            "reconciles",
            "Total number of reconcile passes by outcome",
            reconciles.clone(),
        );

        let failures = Family::<StepLabels, Counter>::default();
        reg.register(
            "failures",
            "Total number of reconcile passes that failed, by the step that failed",
            failures.clone(),
        );

        let restarts = Counter::default();
        reg.register(
            "restarts",
            "Total number of authservice restarts triggered",
            restarts.clone(),
        );

        let policy_writes = Family::<WriteLabels, Counter>::default();
        reg.register(
            "policy_writes",
            "Total number of RequestAuthentication writes by operation",
            policy_writes.clone(),
        );

        Self {
            reconciles,
            failures,
            restarts,
            policy_writes,
        }
    }

    pub(crate) fn completed(&self, outcome: &Outcome) {
        let outcome = match outcome {
            Outcome::Applied { .. } => "applied",
            Outcome::TriggerNotFound => "trigger_not_found",
            Outcome::Abandoned(_) => "abandoned",
        };
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome })
            .inc();
    }

    pub(crate) fn failed(&self, step: Step) {
        self.reconciles
            .get_or_create(&OutcomeLabels { outcome: "failed" })
            .inc();
        self.failures
            .get_or_create(&StepLabels {
                step: step.as_str(),
            })
            .inc();
    }

    pub(crate) fn restarted(&self) {
        self.restarts.inc();
    }

    pub(crate) fn policy_write(&self, write: PolicyWrite) {
        let op = match write {
            PolicyWrite::Created => "create",
            PolicyWrite::Updated => "update",
            PolicyWrite::Unchanged => return,
        };
        self.policy_writes.get_or_create(&WriteLabels { op }).inc();
    }

    pub(crate) fn policy_deleted(&self) {
        self.policy_writes
            .get_or_create(&WriteLabels { op: "delete" })
            .inc();
    }
}
