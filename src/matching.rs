//! # Rule Engine
//!
//! Associates a freshly imported request with a process through the rules of
//! the connector that imported it. Rules arrive pre-filtered to the
//! connector, active-only and ordered ascending by position (the rules
//! repository's contract); the matcher scans them in that order and the
//! first rule whose predicate evaluates true wins.
//!
//! Predicate evaluation itself is opaque to the core and delegated to a
//! [`RuleEvaluator`]. An evaluator failure on one rule is logged and treated
//! as a non-match so a malformed predicate cannot block the rules behind it.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::error::Result;
use crate::models::{Request, Rule};

/// Outcome of running the rule engine over a request.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    /// The first rule whose predicate matched the request.
    Matched(Rule),
    /// Every rule was scanned and none matched.
    NoMatch,
}

/// Evaluates an opaque rule predicate against a request's attributes.
pub trait RuleEvaluator: Send + Sync {
    fn evaluate(&self, predicate: &str, request: &Request) -> Result<bool>;
}

/// A matcher that associates a request with a process through connector
/// rules.
pub struct RequestMatcher {
    evaluator: Arc<dyn RuleEvaluator>,
}

impl RequestMatcher {
    pub fn new(evaluator: Arc<dyn RuleEvaluator>) -> Self {
        Self { evaluator }
    }

    /// Check the given rules in order and return the first one that matches
    /// the request.
    ///
    /// Given the same request and the same rule list, the outcome is always
    /// the same rule.
    pub fn match_request_with_rules(&self, request: &Request, rules: &[Rule]) -> MatchOutcome {
        debug!(request_id = request.id, "Checking request matching with rules");

        for rule in rules {
            if rule.predicate.trim().is_empty() {
                debug!(position = rule.position, "Rule at position is empty.");
                continue;
            }

            if !rule.active {
                debug!(position = rule.position, "Rule at position is inactive.");
                continue;
            }

            debug!(position = rule.position, "Checking matching with rule at position.");

            match self.evaluator.evaluate(&rule.predicate, request) {
                Ok(true) => {
                    info!(
                        request_id = request.id,
                        position = rule.position,
                        "Request matched with rule"
                    );
                    return MatchOutcome::Matched(rule.clone());
                }
                Ok(false) => {}
                Err(evaluation_error) => {
                    error!(
                        position = rule.position,
                        error = %evaluation_error,
                        "Could not match request with rule"
                    );
                }
            }
        }

        MatchOutcome::NoMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;

    /// Matches when the predicate equals the request's client field.
    struct ClientEqualsEvaluator;

    impl RuleEvaluator for ClientEqualsEvaluator {
        fn evaluate(&self, predicate: &str, request: &Request) -> Result<bool> {
            Ok(predicate == request.client)
        }
    }

    struct FailingEvaluator;

    impl RuleEvaluator for FailingEvaluator {
        fn evaluate(&self, predicate: &str, _request: &Request) -> Result<bool> {
            if predicate == "boom" {
                return Err(ExtractError::Plugin("bad predicate".to_string()));
            }
            Ok(true)
        }
    }

    fn request_for_client(client: &str) -> Request {
        let mut request = Request::new_imported(1, 1, "order", "product");
        request.client = client.to_string();
        request
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let matcher = RequestMatcher::new(Arc::new(ClientEqualsEvaluator));
        let request = request_for_client("acme");
        let rules = vec![
            Rule::new(1, 1, 1, 10, "globex"),
            Rule::new(2, 1, 2, 20, "acme"),
            Rule::new(3, 1, 3, 30, "acme"),
        ];

        let outcome = matcher.match_request_with_rules(&request, &rules);

        match outcome {
            MatchOutcome::Matched(rule) => assert_eq!(rule.position, 2),
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn test_result_is_deterministic() {
        let matcher = RequestMatcher::new(Arc::new(ClientEqualsEvaluator));
        let request = request_for_client("acme");
        let rules = vec![
            Rule::new(1, 1, 1, 10, "acme"),
            Rule::new(2, 1, 2, 20, "acme"),
        ];

        for _ in 0..10 {
            match matcher.match_request_with_rules(&request, &rules) {
                MatchOutcome::Matched(rule) => assert_eq!(rule.id, 1),
                MatchOutcome::NoMatch => panic!("expected a match"),
            }
        }
    }

    #[test]
    fn test_no_rule_matches() {
        let matcher = RequestMatcher::new(Arc::new(ClientEqualsEvaluator));
        let request = request_for_client("initech");
        let rules = vec![Rule::new(1, 1, 1, 10, "acme")];

        assert_eq!(
            matcher.match_request_with_rules(&request, &rules),
            MatchOutcome::NoMatch
        );
    }

    #[test]
    fn test_empty_and_inactive_rules_are_skipped() {
        let matcher = RequestMatcher::new(Arc::new(ClientEqualsEvaluator));
        let request = request_for_client("acme");
        let mut inactive = Rule::new(1, 1, 1, 10, "acme");
        inactive.active = false;
        let rules = vec![
            inactive,
            Rule::new(2, 1, 2, 20, "  "),
            Rule::new(3, 1, 3, 30, "acme"),
        ];

        match matcher.match_request_with_rules(&request, &rules) {
            MatchOutcome::Matched(rule) => assert_eq!(rule.position, 3),
            MatchOutcome::NoMatch => panic!("expected a match"),
        }
    }

    #[test]
    fn test_evaluator_failure_is_a_non_match() {
        let matcher = RequestMatcher::new(Arc::new(FailingEvaluator));
        let request = request_for_client("acme");
        let rules = vec![Rule::new(1, 1, 1, 10, "boom"), Rule::new(2, 1, 2, 20, "ok")];

        match matcher.match_request_with_rules(&request, &rules) {
            MatchOutcome::Matched(rule) => assert_eq!(rule.position, 2),
            MatchOutcome::NoMatch => panic!("expected the second rule to match"),
        }
    }

    #[test]
    fn test_empty_rule_list_never_matches() {
        let matcher = RequestMatcher::new(Arc::new(ClientEqualsEvaluator));
        let request = request_for_client("acme");
        assert_eq!(
            matcher.match_request_with_rules(&request, &[]),
            MatchOutcome::NoMatch
        );
    }
}
