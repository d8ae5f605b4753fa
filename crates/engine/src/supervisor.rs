// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AI supervisor seam.
//!
//! Three RPCs: assess an issue before the agent runs, analyze the result
//! after, and classify duplicate candidates. Every response reports token and
//! dollar usage for the budget tracker.

use async_trait::async_trait;
use thiserror::Error;
use vc_agent::{AgentOutcome, CandidateIssue};
use vc_core::{Issue, IssueId};

/// Errors from supervisor calls.
#[derive(Debug, Error)]
#[error("supervisor call failed: {0}")]
pub struct SupervisorError(pub String);

/// Token/dollar usage of one call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AiUsage {
    pub tokens: u64,
    pub cost_usd: f64,
}

/// Pre-flight issue assessment.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Confidence the agent can complete this issue, in [0, 1].
    pub confidence: f64,
    pub estimated_effort: String,
    pub risks: Vec<String>,
    pub suggested_approach: String,
    pub usage: AiUsage,
}

/// Post-run result analysis.
#[derive(Debug, Clone, Default)]
pub struct ResultAnalysis {
    pub confidence: f64,
    pub discovered_issues: Vec<CandidateIssue>,
    /// Classification when tests failed (e.g. "pre-existing", "regression").
    pub test_failure_diagnosis: Option<String>,
    pub usage: AiUsage,
}

/// Pairwise duplicate verdict.
#[derive(Debug, Clone)]
pub struct DuplicateVerdict {
    pub is_duplicate: bool,
    pub duplicate_of: Option<IssueId>,
    pub confidence: f64,
    pub reasoning: String,
    pub usage: AiUsage,
}

impl DuplicateVerdict {
    /// A confident "not a duplicate".
    pub fn unique() -> Self {
        Self {
            is_duplicate: false,
            duplicate_of: None,
            confidence: 1.0,
            reasoning: "no match".to_string(),
            usage: AiUsage::default(),
        }
    }
}

/// The AI supervisor contract.
#[async_trait]
pub trait Supervisor: Send + Sync + 'static {
    async fn assess_issue(&self, issue: &Issue) -> Result<Assessment, SupervisorError>;

    async fn analyze_result(
        &self,
        issue: &Issue,
        outcome: &AgentOutcome,
    ) -> Result<ResultAnalysis, SupervisorError>;

    /// Candidate vs. an existing store issue.
    async fn classify_duplicate(
        &self,
        candidate: &CandidateIssue,
        existing: &Issue,
    ) -> Result<DuplicateVerdict, SupervisorError>;

    /// Candidate vs. another candidate of the same batch.
    async fn classify_candidate_pair(
        &self,
        candidate: &CandidateIssue,
        other: &CandidateIssue,
    ) -> Result<DuplicateVerdict, SupervisorError>;
}

/// Offline stand-in used when no supervisor endpoint is configured.
///
/// Deterministic and free: middling assessment confidence, no discovered
/// issues beyond what the agent reported, and duplicate verdicts from plain
/// token overlap. Real deployments wire an RPC-backed implementation instead.
#[derive(Clone, Default)]
pub struct HeuristicSupervisor;

impl HeuristicSupervisor {
    fn overlap_verdict(a: &str, b: &str) -> DuplicateVerdict {
        let tokens = |s: &str| -> std::collections::BTreeSet<String> {
            s.split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.len() > 3)
                .map(str::to_lowercase)
                .collect()
        };
        let left = tokens(a);
        let right = tokens(b);
        if left.is_empty() {
            return DuplicateVerdict::unique();
        }
        let shared = left.intersection(&right).count();
        let fraction = shared as f64 / left.len() as f64;
        DuplicateVerdict {
            is_duplicate: fraction >= 0.9,
            duplicate_of: None,
            confidence: fraction,
            reasoning: format!("token overlap {fraction:.2}"),
            usage: AiUsage::default(),
        }
    }
}

#[async_trait]
impl Supervisor for HeuristicSupervisor {
    async fn assess_issue(&self, _issue: &Issue) -> Result<Assessment, SupervisorError> {
        Ok(Assessment {
            confidence: 0.5,
            estimated_effort: "unknown".to_string(),
            risks: Vec::new(),
            suggested_approach: String::new(),
            usage: AiUsage::default(),
        })
    }

    async fn analyze_result(
        &self,
        _issue: &Issue,
        outcome: &AgentOutcome,
    ) -> Result<ResultAnalysis, SupervisorError> {
        Ok(ResultAnalysis {
            confidence: if outcome.success { 0.7 } else { 0.3 },
            discovered_issues: Vec::new(),
            test_failure_diagnosis: None,
            usage: AiUsage::default(),
        })
    }

    async fn classify_duplicate(
        &self,
        candidate: &CandidateIssue,
        existing: &Issue,
    ) -> Result<DuplicateVerdict, SupervisorError> {
        let mut verdict = Self::overlap_verdict(
            &format!("{} {}", candidate.title, candidate.description),
            &format!("{} {}", existing.title, existing.description),
        );
        if verdict.is_duplicate {
            verdict.duplicate_of = Some(existing.id.clone());
        }
        Ok(verdict)
    }

    async fn classify_candidate_pair(
        &self,
        candidate: &CandidateIssue,
        other: &CandidateIssue,
    ) -> Result<DuplicateVerdict, SupervisorError> {
        Ok(Self::overlap_verdict(
            &format!("{} {}", candidate.title, candidate.description),
            &format!("{} {}", other.title, other.description),
        ))
    }
}

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSupervisor;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Scripted supervisor for tests.
    ///
    /// Duplicate verdicts are keyed by `(candidate title, other title/id)`;
    /// anything unscripted is unique. Discovered issues are returned from
    /// every `analyze_result` call.
    #[derive(Clone, Default)]
    pub struct FakeSupervisor {
        inner: Arc<Mutex<FakeInner>>,
    }

    #[derive(Default)]
    struct FakeInner {
        duplicate_verdicts: HashMap<(String, String), DuplicateVerdict>,
        discovered: Vec<CandidateIssue>,
        assessment_confidence: Option<f64>,
        fail_assessment: bool,
        calls: Vec<String>,
    }

    impl FakeSupervisor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script a duplicate verdict for `(candidate_title, other)` where
        /// `other` is an issue id (store comparisons) or candidate title
        /// (within-batch comparisons).
        pub fn script_duplicate(
            &self,
            candidate_title: &str,
            other: &str,
            duplicate_of: Option<&str>,
            confidence: f64,
        ) {
            self.inner.lock().duplicate_verdicts.insert(
                (candidate_title.to_string(), other.to_string()),
                DuplicateVerdict {
                    is_duplicate: true,
                    duplicate_of: duplicate_of.map(IssueId::new),
                    confidence,
                    reasoning: "scripted".to_string(),
                    usage: AiUsage {
                        tokens: 10,
                        cost_usd: 0.01,
                    },
                },
            );
        }

        /// Return these candidates from every `analyze_result` call.
        pub fn discover(&self, candidates: Vec<CandidateIssue>) {
            self.inner.lock().discovered = candidates;
        }

        pub fn set_assessment_confidence(&self, confidence: f64) {
            self.inner.lock().assessment_confidence = Some(confidence);
        }

        pub fn fail_assessments(&self) {
            self.inner.lock().fail_assessment = true;
        }

        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }

        pub fn ai_calls_made(&self) -> usize {
            self.inner.lock().calls.len()
        }
    }

    #[async_trait]
    impl Supervisor for FakeSupervisor {
        async fn assess_issue(&self, issue: &Issue) -> Result<Assessment, SupervisorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(format!("assess:{}", issue.id));
            if inner.fail_assessment {
                return Err(SupervisorError("scripted assessment failure".to_string()));
            }
            Ok(Assessment {
                confidence: inner.assessment_confidence.unwrap_or(0.9),
                estimated_effort: "small".to_string(),
                risks: Vec::new(),
                suggested_approach: "just do it".to_string(),
                usage: AiUsage {
                    tokens: 100,
                    cost_usd: 0.05,
                },
            })
        }

        async fn analyze_result(
            &self,
            issue: &Issue,
            outcome: &AgentOutcome,
        ) -> Result<ResultAnalysis, SupervisorError> {
            let mut inner = self.inner.lock();
            inner.calls.push(format!("analyze:{}", issue.id));
            Ok(ResultAnalysis {
                confidence: if outcome.success { 0.9 } else { 0.3 },
                discovered_issues: inner.discovered.clone(),
                test_failure_diagnosis: None,
                usage: AiUsage {
                    tokens: 200,
                    cost_usd: 0.1,
                },
            })
        }

        async fn classify_duplicate(
            &self,
            candidate: &CandidateIssue,
            existing: &Issue,
        ) -> Result<DuplicateVerdict, SupervisorError> {
            let mut inner = self.inner.lock();
            inner
                .calls
                .push(format!("dup:{}:{}", candidate.title, existing.id));
            Ok(inner
                .duplicate_verdicts
                .get(&(candidate.title.clone(), existing.id.to_string()))
                .cloned()
                .unwrap_or_else(DuplicateVerdict::unique))
        }

        async fn classify_candidate_pair(
            &self,
            candidate: &CandidateIssue,
            other: &CandidateIssue,
        ) -> Result<DuplicateVerdict, SupervisorError> {
            let mut inner = self.inner.lock();
            inner
                .calls
                .push(format!("pair:{}:{}", candidate.title, other.title));
            Ok(inner
                .duplicate_verdicts
                .get(&(candidate.title.clone(), other.title.clone()))
                .cloned()
                .unwrap_or_else(DuplicateVerdict::unique))
        }
    }
}
