// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `vc init` — seed `<project>/.beads/` with an empty database and feed.

use crate::exit_error::ExitError;
use std::path::Path;
use vc_store::{EmbeddedStore, IssueStore, StorePaths};

pub fn run(project_root: &Path) -> Result<(), ExitError> {
    let paths = StorePaths::for_project(project_root);
    if paths.database_exists() {
        println!("database already exists at {}", paths.db_path.display());
        return Ok(());
    }

    std::fs::create_dir_all(paths.store_dir())?;
    EmbeddedStore::create(&paths)?;

    // Stamp the import time so the empty feed does not read as stale
    let store = EmbeddedStore::open(paths.clone())?;
    store.import_issues(Vec::new())?;

    println!("initialized {}", paths.db_path.display());
    println!("feed: {}", paths.feed_path.display());
    Ok(())
}
