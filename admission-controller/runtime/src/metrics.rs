use crate::core::Decision;
use prometheus_client::{
    encoding::EncodeLabelSet,
    metrics::{counter::Counter, family::Family},
    registry::Registry,
};

#[derive(Clone, Debug, Default)]
pub struct AdmissionMetrics {
    reviews: Family<ReviewLabels, Counter>,
    invalid: Counter,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReviewLabels {
    result: &'static str,
    reason: &'static str,
}

// === impl AdmissionMetrics ===

impl AdmissionMetrics {
    pub fn register(reg: &mut Registry) -> Self {
        let reviews = Family::default();
        reg.register(
            "reviews",
            "Count of PipelineRun admission reviews by result",
            reviews.clone(),
        );

        let invalid = Counter::default();
        reg.register(
            "invalid_reviews",
            "Count of admission reviews that could not be evaluated",
            invalid.clone(),
        );

        Self { reviews, invalid }
    }

    pub(crate) fn decided(&self, decision: &Decision) {
        let result = if decision.allowed {
            "allowed"
        } else {
            "denied"
        };
        self.reviews
            .get_or_create(&ReviewLabels {
                result,
                reason: decision.reason.as_str(),
            })
            .inc();
    }

    pub(crate) fn invalid(&self) {
        self.invalid.inc();
    }
}
