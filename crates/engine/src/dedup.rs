// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deduplication of discovered candidate issues.
//!
//! Candidates are compared against existing open issues (bounded by a cheap
//! lexical pre-filter) and then pairwise within the batch. Duplicates above
//! the confidence threshold are not filed; survivors become new issues with
//! a `discovered_from` dependency on the originating issue.
//!
//! A duplicate whose match target is already closed gets a cross-reference
//! only — creating a hard blocker on a closed issue would break the
//! status/closed_at invariant — and the candidate is filed as a fresh open
//! issue (or dropped, per config).

use crate::supervisor::Supervisor;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;
use vc_agent::{CandidateIssue, EventSink};
use vc_core::{
    AgentEvent, Clock, Dependency, DependencyKind, EventType, IdGen, Issue, IssueId, Severity,
};
use vc_store::IssueStore;

/// Dedup knobs.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// Verdicts below this confidence do not count as duplicates.
    pub confidence_threshold: f64,
    /// Minimum fraction of candidate tokens shared with an existing issue to
    /// reach the AI comparison.
    pub prefilter_min_overlap: f64,
    /// File the candidate as a fresh open issue when its duplicate target is
    /// closed (false = drop it).
    pub file_on_closed_duplicate: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            prefilter_min_overlap: 0.25,
            file_on_closed_duplicate: true,
        }
    }
}

/// Totals carried by `deduplication_batch_completed`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct DedupStats {
    pub total_candidates: usize,
    pub unique_count: usize,
    pub duplicate_count: usize,
    pub within_batch_duplicate_count: usize,
    pub comparisons_made: usize,
    pub ai_calls_made: usize,
    pub processing_time_ms: u64,
    pub success: bool,
}

/// Pairwise AI-backed dedup over one batch of candidates.
pub struct DedupEngine<I: IdGen> {
    store: Arc<dyn IssueStore>,
    supervisor: Arc<dyn Supervisor>,
    ids: I,
    config: DedupConfig,
}

impl<I: IdGen> DedupEngine<I> {
    pub fn new(
        store: Arc<dyn IssueStore>,
        supervisor: Arc<dyn Supervisor>,
        ids: I,
        config: DedupConfig,
    ) -> Self {
        Self {
            store,
            supervisor,
            ids,
            config,
        }
    }

    /// Process one batch of discovered candidates for `origin`.
    pub async fn run<C: Clock>(
        &self,
        origin: &IssueId,
        candidates: Vec<CandidateIssue>,
        sink: &EventSink<C>,
        now_ms: u64,
    ) -> DedupStats {
        let started = Instant::now();
        let mut stats = DedupStats {
            total_candidates: candidates.len(),
            success: true,
            ..Default::default()
        };

        sink.emit(
            AgentEvent::info(
                EventType::DeduplicationBatchStarted,
                format!("deduplicating {} candidates", candidates.len()),
            )
            .with_field("total_candidates", candidates.len() as u64),
        )
        .await;

        let existing = match self.store.list_open_issues() {
            Ok(existing) => existing,
            Err(e) => {
                tracing::warn!(error = %e, "dedup could not list existing issues");
                stats.success = false;
                Vec::new()
            }
        };

        // Phase 1: candidates vs. the store
        let mut kept: Vec<CandidateIssue> = Vec::new();
        'candidates: for candidate in candidates {
            let shortlist: Vec<&Issue> = existing
                .iter()
                .filter(|issue| {
                    token_overlap(&candidate, &issue.title, &issue.description)
                        >= self.config.prefilter_min_overlap
                })
                .collect();

            for issue in shortlist {
                stats.comparisons_made += 1;
                stats.ai_calls_made += 1;
                let verdict = match self.supervisor.classify_duplicate(&candidate, issue).await {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        stats.success = false;
                        sink.emit(AgentEvent::new(
                            EventType::Error,
                            Severity::Warning,
                            format!("dedup comparison failed: {e}"),
                        ))
                        .await;
                        continue;
                    }
                };

                sink.emit(
                    AgentEvent::info(
                        EventType::DeduplicationDecision,
                        format!(
                            "{} vs {}: duplicate={}",
                            candidate.title, issue.id, verdict.is_duplicate
                        ),
                    )
                    .with_field("candidate_title", candidate.title.clone())
                    .with_field("against", issue.id.to_string())
                    .with_field("is_duplicate", verdict.is_duplicate)
                    .with_field("confidence", verdict.confidence)
                    .with_field("reasoning", verdict.reasoning.clone()),
                )
                .await;

                if verdict.is_duplicate && verdict.confidence >= self.config.confidence_threshold {
                    let target = verdict.duplicate_of.clone().unwrap_or_else(|| issue.id.clone());
                    let target_closed = self
                        .store
                        .get_issue(&target)
                        .ok()
                        .flatten()
                        .map(|t| t.is_closed())
                        .unwrap_or(false);
                    if target_closed {
                        stats.duplicate_count += 1;
                        self.handle_closed_duplicate(origin, &candidate, &target, now_ms, sink)
                            .await;
                    } else {
                        stats.duplicate_count += 1;
                        if let Err(e) = self.store.add_comment(
                            &target,
                            "vc-dedup",
                            &format!("duplicate candidate suppressed: {}", candidate.title),
                        ) {
                            tracing::warn!(error = %e, "failed to record duplicate link");
                        }
                    }
                    continue 'candidates;
                }
            }

            kept.push(candidate);
        }

        // Phase 2: within-batch, each survivor vs. earlier representatives
        let mut representatives: Vec<CandidateIssue> = Vec::new();
        'survivors: for candidate in kept {
            for repr in &representatives {
                stats.comparisons_made += 1;
                stats.ai_calls_made += 1;
                let verdict = match self
                    .supervisor
                    .classify_candidate_pair(&candidate, repr)
                    .await
                {
                    Ok(verdict) => verdict,
                    Err(e) => {
                        stats.success = false;
                        tracing::warn!(error = %e, "within-batch comparison failed");
                        continue;
                    }
                };

                sink.emit(
                    AgentEvent::info(
                        EventType::DeduplicationDecision,
                        format!(
                            "{} vs {}: within-batch duplicate={}",
                            candidate.title, repr.title, verdict.is_duplicate
                        ),
                    )
                    .with_field("candidate_title", candidate.title.clone())
                    .with_field("against", repr.title.clone())
                    .with_field("is_duplicate", verdict.is_duplicate)
                    .with_field("confidence", verdict.confidence)
                    .with_field("within_batch_duplicate", true),
                )
                .await;

                if verdict.is_duplicate && verdict.confidence >= self.config.confidence_threshold {
                    stats.within_batch_duplicate_count += 1;
                    continue 'survivors;
                }
            }
            representatives.push(candidate);
        }

        // Phase 3: file the survivors
        for candidate in representatives {
            match self.file_candidate(origin, &candidate, now_ms) {
                Ok(_) => stats.unique_count += 1,
                Err(e) => {
                    stats.success = false;
                    sink.emit(AgentEvent::new(
                        EventType::Error,
                        Severity::Warning,
                        format!("failed to file discovered issue `{}`: {e}", candidate.title),
                    ))
                    .await;
                }
            }
        }

        stats.processing_time_ms = started.elapsed().as_millis() as u64;

        sink.emit(
            AgentEvent::info(
                EventType::DeduplicationBatchCompleted,
                format!(
                    "dedup done: {} unique, {} duplicates",
                    stats.unique_count, stats.duplicate_count
                ),
            )
            .with_data(vc_core::to_data(&stats)),
        )
        .await;

        stats
    }

    /// File a survivor as a new open issue linked `discovered_from` origin.
    fn file_candidate(
        &self,
        origin: &IssueId,
        candidate: &CandidateIssue,
        now_ms: u64,
    ) -> Result<IssueId, vc_store::StoreError> {
        let raw = self.ids.mint();
        let id = IssueId::new(format!("vc-{}", raw.get(..8).unwrap_or(&raw)));
        let mut issue = Issue::new(id.clone(), candidate.title.clone(), candidate.kind, now_ms);
        issue.description = candidate.description.clone();
        self.store.create_issue(issue)?;
        self.store.add_dependency(Dependency {
            issue_id: id.clone(),
            depends_on: origin.clone(),
            kind: DependencyKind::DiscoveredFrom,
        })?;
        Ok(id)
    }

    /// The closed-target edge case: cross-reference, never a hard blocker.
    async fn handle_closed_duplicate<C: Clock>(
        &self,
        origin: &IssueId,
        candidate: &CandidateIssue,
        target: &IssueId,
        now_ms: u64,
        sink: &EventSink<C>,
    ) {
        sink.emit(
            AgentEvent::new(
                EventType::DeduplicationDecision,
                Severity::Warning,
                format!(
                    "duplicate target {target} is closed; filing fresh issue with see-also"
                ),
            )
            .with_field("candidate_title", candidate.title.clone())
            .with_field("against", target.to_string())
            .with_field("is_duplicate", true)
            .with_field("target_closed", true),
        )
        .await;

        if !self.config.file_on_closed_duplicate {
            return;
        }

        match self.file_candidate(origin, candidate, now_ms) {
            Ok(new_id) => {
                // see-also link; Related is safe against closed targets
                if let Err(e) = self.store.add_dependency(Dependency {
                    issue_id: new_id.clone(),
                    depends_on: target.clone(),
                    kind: DependencyKind::Related,
                }) {
                    tracing::warn!(error = %e, "failed to add see-also link");
                }
                if let Err(e) = self.store.add_comment(
                    &new_id,
                    "vc-dedup",
                    &format!("looks like closed issue {target}; filed fresh (see-also)"),
                ) {
                    tracing::warn!(error = %e, "failed to add see-also comment");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to file closed-duplicate candidate");
            }
        }
    }
}

/// Fraction of the candidate's significant tokens present in the issue text.
fn token_overlap(candidate: &CandidateIssue, title: &str, description: &str) -> f64 {
    let candidate_tokens = significant_tokens(&format!(
        "{} {}",
        candidate.title, candidate.description
    ));
    if candidate_tokens.is_empty() {
        return 0.0;
    }
    let issue_tokens = significant_tokens(&format!("{title} {description}"));
    let shared = candidate_tokens.intersection(&issue_tokens).count();
    shared as f64 / candidate_tokens.len() as f64
}

fn significant_tokens(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 3)
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
#[path = "dedup_tests.rs"]
mod tests;
