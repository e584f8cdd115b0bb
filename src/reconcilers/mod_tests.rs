// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for reconciler helper functions.

#[cfg(test)]
mod tests {
    use super::super::{requeue_for, should_reconcile};
    use kube::runtime::controller::Action;
    use std::time::Duration;

    // ========== Tests for should_reconcile() ==========

    #[test]
    fn test_should_reconcile_when_generations_equal() {
        assert!(
            !should_reconcile(Some(5), Some(5)),
            "Should not reconcile when generations match"
        );
    }

    #[test]
    fn test_should_reconcile_when_generations_differ() {
        assert!(
            should_reconcile(Some(7), Some(5)),
            "Should reconcile when current > observed"
        );
    }

    #[test]
    fn test_should_reconcile_first_reconciliation() {
        assert!(
            should_reconcile(Some(1), None),
            "Should reconcile on first reconciliation (observed=None)"
        );
    }

    #[test]
    fn test_should_reconcile_no_generation_tracking() {
        assert!(!should_reconcile(None, Some(5)));
        assert!(!should_reconcile(None, None));
    }

    #[test]
    fn test_should_reconcile_generation_decreased() {
        // Only happens after a restore; treat as a change
        assert!(should_reconcile(Some(3), Some(5)));
    }

    // ========== Tests for requeue_for() ==========

    #[test]
    fn test_ready_awaits_change() {
        assert_eq!(requeue_for(true), Action::await_change());
    }

    #[test]
    fn test_not_ready_requeues_after_five_minutes() {
        assert_eq!(requeue_for(false), Action::requeue(Duration::from_secs(300)));
    }
}
