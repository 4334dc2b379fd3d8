use serde::Serialize;

use crate::request::{ProcurementRequest, RequestStatus};

/// Dashboard counters for procurement requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestStats {
    pub total: usize,
    pub draft: usize,
    pub submitted: usize,
    pub in_review: usize,
    pub approved: usize,
    pub rejected: usize,
    pub completed: usize,
    pub canceled: usize,
    /// Estimated value of everything not canceled or rejected.
    pub open_value: f64,
    /// Estimated value of approved and completed requests.
    pub approved_value: f64,
}

pub fn request_stats(requests: &[ProcurementRequest]) -> RequestStats {
    let mut stats = RequestStats::default();
    for request in requests {
        stats.total += 1;
        let value = request.estimated_total();
        match request.status() {
            RequestStatus::Draft => stats.draft += 1,
            RequestStatus::Submitted => stats.submitted += 1,
            RequestStatus::InReview => stats.in_review += 1,
            RequestStatus::Approved => stats.approved += 1,
            RequestStatus::Rejected => stats.rejected += 1,
            RequestStatus::Completed => stats.completed += 1,
            RequestStatus::Canceled => stats.canceled += 1,
        }
        if !matches!(request.status(), RequestStatus::Canceled | RequestStatus::Rejected) {
            stats.open_value += value;
        }
        if matches!(request.status(), RequestStatus::Approved | RequestStatus::Completed) {
            stats.approved_value += value;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CancelRequest, RequestCommand, test_request};
    use chrono::Utc;
    use procura_core::{Aggregate, TenantId, approx_eq};
    use proptest::prelude::*;

    #[test]
    fn canceled_requests_do_not_count_toward_open_value() {
        let tenant_id = TenantId::new();
        let open = test_request(tenant_id, &[(2.0, 50.0)]);
        let mut canceled = test_request(tenant_id, &[(1.0, 1000.0)]);
        let request_id = canceled.id_typed();
        for e in canceled
            .handle(&RequestCommand::CancelRequest(CancelRequest {
                tenant_id,
                request_id,
                reason: Some("duplicate".to_string()),
                occurred_at: Utc::now(),
            }))
            .unwrap()
        {
            canceled.apply(&e);
        }

        let stats = request_stats(&[open, canceled]);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.draft, 1);
        assert_eq!(stats.canceled, 1);
        assert_eq!(stats.open_value, 100.0);
        assert_eq!(stats.approved_value, 0.0);
    }

    proptest! {
        #[test]
        fn estimated_total_is_sum_of_lines(lines in prop::collection::vec((0.01f64..1000.0, 0.0f64..10_000.0), 0..20)) {
            let request = test_request(TenantId::new(), &lines);
            let expected: f64 = lines.iter().map(|(q, p)| q * p).sum();
            prop_assert!(approx_eq(request.estimated_total(), expected));
        }
    }
}
