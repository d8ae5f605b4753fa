// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use vc_core::test_support::open_issue;
use vc_core::{InstanceId, IssueId};

#[test]
fn records_carry_type_tags() {
    let record = StoreRecord::IssueClaimed {
        id: IssueId::new("vc-1"),
        instance: InstanceId::new("inst-1"),
        at: 42,
    };
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["type"], "issue:claimed");
    assert_eq!(json["id"], "vc-1");
    assert_eq!(json["at"], 42);
}

#[test]
fn record_roundtrip() {
    let records = vec![
        StoreRecord::IssueCreated {
            issue: open_issue("vc-1", 1),
        },
        StoreRecord::IssueClosed {
            id: IssueId::new("vc-1"),
            at: 7,
        },
        StoreRecord::LabelAdded {
            id: IssueId::new("vc-1"),
            label: "interrupted".to_string(),
        },
        StoreRecord::Heartbeat {
            id: InstanceId::new("inst-1"),
            at: 9,
        },
        StoreRecord::ImportCompleted { at: 11 },
    ];
    for record in records {
        let json = serde_json::to_string(&record).unwrap();
        let back: StoreRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
