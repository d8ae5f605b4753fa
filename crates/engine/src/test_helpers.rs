// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for engine tests: a real embedded store in a temp dir,
//! fake git/supervisor, and a scripted shell agent.

use crate::budget::{BudgetConfig, CostTracker};
use crate::config::ExecutorConfig;
use crate::dedup::{DedupConfig, DedupEngine};
use crate::gates::{GateConfig, GateRunner};
use crate::pipeline::PipelineDeps;
use crate::sandbox::{FakeGit, SandboxManager};
use crate::supervisor::FakeSupervisor;
use std::sync::Arc;
use std::time::Duration;
use vc_agent::fake::ScriptedAgent;
use vc_core::{SequentialIdGen, SystemClock};
use vc_store::{EmbeddedStore, StorePaths};

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub store: Arc<EmbeddedStore>,
    pub supervisor: FakeSupervisor,
    pub git: FakeGit,
    pub deps: PipelineDeps<SystemClock, SequentialIdGen>,
}

pub fn harness(agent: &ScriptedAgent, gates: Vec<GateConfig>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let paths = StorePaths::for_database(&dir.path().join(".beads/test.db"));
    let store = Arc::new(EmbeddedStore::open(paths).unwrap());

    let supervisor = FakeSupervisor::new();
    let git = FakeGit::new();

    let parent_repo = dir.path().join("repo");
    std::fs::create_dir_all(&parent_repo).unwrap();
    let sandbox_root = dir.path().join("sandboxes");

    let mut config = ExecutorConfig {
        sandbox_root: sandbox_root.clone(),
        parent_repo: parent_repo.clone(),
        poll_interval: Duration::from_secs(1),
        shutdown_grace: Duration::from_secs(10),
        gates: gates.clone(),
        ..ExecutorConfig::default()
    };
    config.agent.program = agent.program.clone();
    config.agent.args = agent.args.clone();
    config.agent.timeout = Duration::from_secs(10);
    config.agent.kill_grace = Duration::from_millis(500);

    let deps = PipelineDeps {
        store: store.clone() as Arc<dyn vc_store::IssueStore>,
        supervisor: Arc::new(supervisor.clone()),
        git: Arc::new(git.clone()),
        sandboxes: SandboxManager::new(
            sandbox_root,
            parent_repo,
            true,
            Arc::new(git.clone()),
        ),
        gates: GateRunner::new(gates, SystemClock),
        dedup: DedupEngine::new(
            store.clone() as Arc<dyn vc_store::IssueStore>,
            Arc::new(supervisor.clone()),
            SequentialIdGen::new("disc"),
            DedupConfig::default(),
        ),
        budget: Arc::new(CostTracker::new(BudgetConfig::default(), SystemClock)),
        config,
        clock: SystemClock,
    };

    Harness {
        dir,
        store,
        supervisor,
        git,
        deps,
    }
}
