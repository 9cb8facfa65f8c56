// End-to-end loss runs against the mocked NFM-T client

use otsloss_core::LossError;
use otsloss_devkit::fixtures::{
    empty_pm_response, far_end_key, fiber_core, ots_connection, pm_row, raman_ots,
};
use otsloss_devkit::{MockCall, MockEndpoint, TestHarness};
use serde_json::{json, Value};
use std::time::Duration;

fn two_core_ots(harness: &TestHarness, id: i64, label: &str) {
    harness.add_raman_ots(
        id,
        label,
        vec![
            fiber_core(
                &format!("{}/A-LD", label),
                &format!("{}/Z-RA2P-LINEIN", label),
                "-5.0",
                "-99.0",
                "N.A.",
            ),
            fiber_core(
                &format!("{}/A2-LD", label),
                &format!("{}/Z2-RA2P-LINEIN", label),
                "-5.0",
                "-99.0",
                "15.0",
            ),
        ],
        Some(vec![pm_row(
            "01/02/2024 10:45",
            &[
                (format!("{}/Z-RA2P-LINEIN", label).as_str(), "-25.0"),
                (far_end_key(&format!("{}/Z2-RA2P-LINEIN", label)).as_str(), "-25.0"),
            ],
        )]),
    );
}

fn silent_ots(harness: &TestHarness, id: i64, label: &str) {
    harness.add_raman_ots(
        id,
        label,
        vec![fiber_core(
            &format!("{}/A-LD", label),
            &format!("{}/Z-RA2P-LINEIN", label),
            "-5.0",
            "-25.0",
            "N.A.",
        )],
        Some(vec![pm_row(
            "01/02/2024 10:45",
            &[(format!("{}/Z-RA2P-LINEIN", label).as_str(), "")],
        )]),
    );
}

fn row_set(report: &otsloss_core::Report) -> Vec<(String, String, String)> {
    let mut rows: Vec<_> = report
        .records
        .iter()
        .map(|row| {
            (
                row.connection.clone(),
                row.egress_port.clone(),
                row.total_loss.to_string(),
            )
        })
        .collect();
    rows.sort();
    rows
}

#[tokio::test]
async fn test_skips_connection_without_telemetry() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    silent_ots(&harness, 2, "OTS-B");

    let report = harness.run().await.unwrap();
    assert_eq!(report.selected, 2);
    assert_eq!(report.records.len(), 2);
    harness.assert_losses(&report, "OTS-A", &[20.0, 35.0]).unwrap();
    harness.assert_skipped(&report, "OTS-B").unwrap();

    let first = &report.records[0];
    assert_eq!(first.ingress_power, -25.0);
    assert_eq!(first.ingress_port, "OTS-A/Z-RA2P-LINEIN");
}

#[tokio::test]
async fn test_no_telemetry_anywhere_is_empty_report() {
    let harness = TestHarness::new("RA2P");
    silent_ots(&harness, 1, "OTS-A");
    silent_ots(&harness, 2, "OTS-B");

    let err = harness.run().await.unwrap_err();
    assert!(matches!(
        err,
        LossError::EmptyReport {
            selected: 2,
            skipped: 2
        }
    ));
}

#[tokio::test]
async fn test_nothing_selected_is_empty_report() {
    let harness = TestHarness::new("RA2P");
    harness.client.add_connection(
        ots_connection(1, "OTS-X")
            .a_port("X/A-RA4P")
            .z_port("X/Z-RA4P")
            .build(),
    );

    let err = harness.run().await.unwrap_err();
    assert!(matches!(
        err,
        LossError::EmptyReport {
            selected: 0,
            skipped: 0
        }
    ));
    assert_eq!(harness.client.call_count(MockEndpoint::ManagedConnections), 0);
    assert_eq!(harness.client.call_count(MockEndpoint::Characteristics), 0);
}

#[tokio::test]
async fn test_row_set_independent_of_completion_order() {
    let mut outcomes = Vec::new();
    for delays in [[40u64, 0, 20], [0, 40, 20], [20, 0, 40]] {
        let harness = TestHarness::new("RA2P");
        two_core_ots(&harness, 1, "OTS-A");
        two_core_ots(&harness, 2, "OTS-B");
        two_core_ots(&harness, 3, "OTS-C");
        for (id, delay) in (1..=3).zip(delays) {
            harness
                .client
                .delay_connection(id, Duration::from_millis(delay));
        }

        let report = harness.run().await.unwrap();
        assert_eq!(report.records.len(), 6);

        // Rows of one connection stay adjacent and in characteristics order
        for pair in report.records.chunks(2) {
            assert_eq!(pair[0].connection, pair[1].connection);
            assert!(pair[0].egress_port.ends_with("/A-LD"));
            assert!(pair[1].egress_port.ends_with("/A2-LD"));
        }
        outcomes.push(row_set(&report));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[1], outcomes[2]);
}

#[tokio::test]
async fn test_latest_sample_wins() {
    let harness = TestHarness::new("RA2P");
    harness.add_raman_ots(
        1,
        "OTS-A",
        vec![fiber_core("OTS-A/A-LD", "OTS-A/Z-RA2P-LINEIN", "-5.0", "0", "N.A.")],
        Some(vec![
            pm_row("01/02/2024 10:15", &[("OTS-A/Z-RA2P-LINEIN", "-25.0")]),
            pm_row("01/02/2024 10:00", &[("OTS-A/Z-RA2P-LINEIN", "-30.0")]),
            pm_row("01/02/2024 10:30", &[("OTS-A/Z-RA2P-LINEIN", "")]),
        ]),
    );

    let report = harness.run().await.unwrap();
    harness.assert_losses(&report, "OTS-A", &[20.0]).unwrap();
}

#[tokio::test]
async fn test_bad_power_aborts_run() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    harness.add_raman_ots(
        2,
        "OTS-B",
        vec![fiber_core("OTS-B/A-LD", "OTS-B/Z-RA2P-LINEIN", "abc", "0", "N.A.")],
        Some(vec![pm_row(
            "01/02/2024 10:45",
            &[("OTS-B/Z-RA2P-LINEIN", "-25.0")],
        )]),
    );

    let err = harness.run().await.unwrap_err();
    assert!(matches!(
        err,
        LossError::InvalidNumber {
            field: "egressPowerOut",
            ..
        }
    ));
    assert!(err.is_fatal_data());
}

#[tokio::test]
async fn test_bad_pm_feed_aborts_run() {
    let harness = TestHarness::new("RA2P");
    harness.add_raman_ots(
        1,
        "OTS-A",
        vec![fiber_core("OTS-A/A-LD", "OTS-A/Z-RA2P-LINEIN", "-5.0", "0", "N.A.")],
        Some(vec![json!({"OTS-A/Z-RA2P-LINEIN": "-25.0"})]),
    );
    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, LossError::MissingSampleTime));

    let harness = TestHarness::new("RA2P");
    harness.add_raman_ots(
        1,
        "OTS-A",
        vec![fiber_core("OTS-A/A-LD", "OTS-A/Z-RA2P-LINEIN", "-5.0", "0", "N.A.")],
        Some(vec![pm_row("2024-01-02T10:45", &[("OTS-A/Z-RA2P-LINEIN", "-25.0")])]),
    );
    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, LossError::MalformedTimestamp(_)));
}

#[tokio::test]
async fn test_unmanaged_connection_is_skipped() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    harness.add_raman_ots(
        2,
        "OTS-B",
        vec![fiber_core("OTS-B/A-LD", "OTS-B/Z-RA2P-LINEIN", "-5.0", "0", "N.A.")],
        None,
    );

    let report = harness.run().await.unwrap();
    harness.assert_skipped(&report, "OTS-B").unwrap();
    assert_eq!(harness.client.call_count(MockEndpoint::PmSeries), 1);
}

#[tokio::test]
async fn test_managed_connection_without_pm_objects_is_skipped() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    harness
        .client
        .add_connection(raman_ots(2, "OTS-B").build())
        .set_characteristics(
            2,
            json!([fiber_core("OTS-B/A-LD", "OTS-B/Z-RA2P-LINEIN", "-5.0", "0", "N.A.")]),
        )
        .add_managed("OTS-B", "pm-2")
        .set_pm_series("pm-2", empty_pm_response());

    let report = harness.run().await.unwrap();
    harness.assert_skipped(&report, "OTS-B").unwrap();
    harness.assert_losses(&report, "OTS-A", &[20.0, 35.0]).unwrap();
    assert_eq!(harness.client.call_count(MockEndpoint::PmSeries), 2);
}

#[tokio::test]
async fn test_platform_queried_once_per_need() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    two_core_ots(&harness, 2, "OTS-B");
    harness.client.add_connection(
        ots_connection(9, "OTS-X")
            .a_port("X/A-RA4P")
            .z_port("X/Z-RA4P")
            .build(),
    );
    harness.client.add_connection(
        ots_connection(10, "OCH-Y")
            .z_port("Y/Z-RA2P-LINEIN")
            .connection_type("WdmPortType_och")
            .build(),
    );

    harness.run().await.unwrap();

    let stats = harness.get_stats();
    assert_eq!(stats.count(MockEndpoint::Inventory), 1);
    assert_eq!(stats.count(MockEndpoint::ManagedConnections), 1);
    assert_eq!(stats.count(MockEndpoint::Characteristics), 2);

    let calls = harness.client.calls();
    assert!(!calls.contains(&MockCall::Characteristics(9)));
    assert!(!calls.contains(&MockCall::Characteristics(10)));
    assert!(calls.contains(&MockCall::PmSeries {
        object_id: TestHarness::pm_object_id(1),
        window: harness.window(),
    }));
}

#[tokio::test]
async fn test_other_ld_type_uses_reported_ingress() {
    let harness = TestHarness::new("RA4P");
    harness.client.add_connection(
        ots_connection(5, "OTS-E")
            .a_port("E/A-RA4P")
            .z_port("E/Z-RA4P-LINEIN")
            .build(),
    );
    harness.client.set_characteristics(
        5,
        json!([fiber_core("E/A-RA4P", "E/Z-RA4P-LINEIN", "-5.0", "-25.0", "N.A.")]),
    );
    harness.client.add_managed("OTS-E", "pm-5");
    harness.client.set_pm_series(
        "pm-5",
        otsloss_devkit::fixtures::pm_response(vec![pm_row(
            "01/02/2024 10:45",
            &[("E/Z-RA4P-LINEIN", "-40.0")],
        )]),
    );

    let report = harness.run().await.unwrap();
    harness.assert_losses(&report, "OTS-E", &[20.0]).unwrap();
    assert_eq!(report.records[0].ingress_power, -25.0);
}

#[tokio::test]
async fn test_http_failure_propagates() {
    let harness = TestHarness::new("RA2P");
    two_core_ots(&harness, 1, "OTS-A");
    harness.client.fail(MockEndpoint::PmSeries, 500);

    let err = harness.run().await.unwrap_err();
    assert!(matches!(err, LossError::Status { status: 500, .. }));
    assert!(!err.is_fatal_data());
}

#[tokio::test]
async fn test_raman_gain_as_number() {
    let harness = TestHarness::new("RA2P");
    harness.add_raman_ots(
        1,
        "OTS-A",
        vec![json!({
            "fromLabel": "OTS-A/A-LD",
            "toLabel": "OTS-A/Z-RA2P-LINEIN",
            "egressPowerOut": -5.0,
            "ingressPowerIn": Value::Null,
            "targetGainStr": 15
        })],
        Some(vec![pm_row(
            "01/02/2024 10:45",
            &[("OTS-A/Z-RA2P-LINEIN", "-25.0")],
        )]),
    );

    let report = harness.run().await.unwrap();
    harness.assert_losses(&report, "OTS-A", &[35.0]).unwrap();
}

otsloss_devkit::loss_test!(test_far_end_alias_only, "RA2P", |harness| {
    harness.add_raman_ots(
        1,
        "OTS-A",
        vec![fiber_core("OTS-A/A-LD", "OTS-A/Z-RA2P-LINEIN", "-3.5", "0", "N.A.")],
        Some(vec![pm_row(
            "01/02/2024 10:45",
            &[(far_end_key("OTS-A/Z-RA2P-LINEIN").as_str(), "-20.0")],
        )]),
    );

    let report = harness.run().await?;
    harness.assert_losses(&report, "OTS-A", &[16.5])?;
    Ok(())
});
