//! Window pipelines: order -> window-partition -> window-frames -> project.

mod support;

use brook_plan::OpNode;
use serde_json::{json, Value};
use support::*;

const AB_DATA: &str = "10,11\n10,12\n10,13\n20,20\n20,21\n30,30\n";

fn ordered_ab_scan() -> OpNode {
    op(
        "order-offset-limit",
        &["a", "b"],
        json!([
            [["labelPath", "a"], ["labelPath", "b"]],
            ["asc", "asc"]
        ]),
        vec![scan_csv(&["a", "b"], AB_DATA)],
    )
}

fn windowed_ab(frame_cfg: Value, projections: Value, labels: &[&str]) -> OpNode {
    let partition = op(
        "window-partition",
        &["a", "b"],
        json!([0, [["labelPath", "a"]], 1, ""]),
        vec![ordered_ab_scan()],
    );
    let frames = op(
        "window-frames",
        &["a", "b"],
        json!([0, 1, [frame_cfg]]),
        vec![partition],
    );
    op("project", labels, projections, vec![frames])
}

#[test]
fn frame_count_rows_one_preceding_one_following() {
    let plan = windowed_ab(
        json!(["rows", "num", -1, "num", 1, "no-others", 0]),
        json!([["labelPath", "a"], ["window-frame-count", 1, 0]]),
        &["a", "count-a"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "2"],
            &["10", "3"],
            &["10", "2"],
            &["20", "2"],
            &["20", "2"],
            &["30", "1"],
        ])
    );
}

#[test]
fn frame_count_excluding_the_current_row() {
    let plan = windowed_ab(
        json!(["rows", "num", -1, "num", 1, "current-row", 0]),
        json!([["labelPath", "a"], ["window-frame-count", 1, 0]]),
        &["a", "count-a"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "1"],
            &["10", "2"],
            &["10", "1"],
            &["20", "1"],
            &["20", "1"],
            &["30", "0"],
        ])
    );
}

#[test]
fn frame_count_current_row_to_unbounded_following() {
    let plan = windowed_ab(
        json!(["rows", "num", 0, "unbounded", 1, "no-others", 0]),
        json!([["labelPath", "a"], ["window-frame-count", 1, 0]]),
        &["a", "count-a"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "3"],
            &["10", "2"],
            &["10", "1"],
            &["20", "2"],
            &["20", "1"],
            &["30", "1"],
        ])
    );
}

#[test]
fn frame_count_unbounded_preceding_to_before_current() {
    let plan = windowed_ab(
        json!(["rows", "unbounded", 0, "num", -1, "no-others", 0]),
        json!([["labelPath", "a"], ["window-frame-count", 1, 0]]),
        &["a", "count-a"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "0"],
            &["10", "1"],
            &["10", "2"],
            &["20", "0"],
            &["20", "1"],
            &["30", "0"],
        ])
    );
}

#[test]
fn row_numbers_are_dense_within_each_partition() {
    let plan = windowed_ab(
        json!(["rows", "unbounded", 0, "unbounded", 0, "no-others", 0]),
        json!([
            ["labelPath", "a"],
            ["window-partition-row-number", 1, 0]
        ]),
        &["a", "rowNumber"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "1"],
            &["10", "2"],
            &["10", "3"],
            &["20", "1"],
            &["20", "2"],
            &["30", "1"],
        ])
    );
}

#[test]
fn first_value_walks_from_before_the_frame() {
    let plan = windowed_ab(
        json!(["rows", "num", -1, "num", 1, "no-others", 0]),
        json!([
            ["labelPath", "a"],
            ["window-frame-step-value", 1, 0, -1, true, 1, ["labelPath", "b"]],
            ["window-frame-step-value", 1, 0, 1, false, 1, ["labelPath", "b"]]
        ]),
        &["a", "firstValue", "lastValue"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "11", "12"],
            &["10", "11", "13"],
            &["10", "12", "13"],
            &["20", "20", "21"],
            &["20", "20", "21"],
            &["30", "30", "30"],
        ])
    );
}

#[test]
fn nth_lead_and_lag_over_the_whole_partition() {
    let plan = windowed_ab(
        json!(["rows", "unbounded", 0, "unbounded", 0, "no-others", 0]),
        json!([
            ["labelPath", "a"],
            ["window-frame-step-value", 1, 0, -1, true, 2, ["labelPath", "b"]],
            ["window-frame-step-value", 1, 0, 0, true, 1, ["labelPath", "b"]],
            ["window-frame-step-value", 1, 0, 0, false, 1, ["labelPath", "b"]]
        ]),
        &["a", "nth2", "lead1", "lag1"],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "12", "12", ""],
            &["10", "12", "13", "11"],
            &["10", "12", "", "12"],
            &["20", "21", "21", ""],
            &["20", "21", "", "20"],
            &["30", "", "", ""],
        ])
    );
}

// Dense-rank tracking plus GROUPS/RANGE frames, over ties in the order key.

const ABC_DATA: &str = "10,11,100\n10,12,101\n10,12,102\n10,12,103\n10,13,104\n20,20,200\n20,20,201\n20,21,202\n30,30,300\n30,31,301\n30,31,302\n";

fn tracked_plan(frame_cfg: Value) -> OpNode {
    let order = op(
        "order-offset-limit",
        &["a", "b", "c"],
        json!([
            [["labelPath", "a"], ["labelPath", "b"], ["labelPath", "c"]],
            ["asc", "asc", "asc"]
        ]),
        vec![scan_csv(&["a", "b", "c"], ABC_DATA)],
    );
    let partition = op(
        "window-partition",
        &["a", "b", "c", "myDenseRank"],
        json!([0, [["labelPath", "a"], ["labelPath", "b"]], 1, "denseRank"]),
        vec![order],
    );
    let frames = op(
        "window-frames",
        &["a", "b", "c", "myDenseRank"],
        json!([0, 1, [frame_cfg]]),
        vec![partition],
    );
    op(
        "project",
        &["a", "c", "denseRank", "firstValue", "lastValue"],
        json!([
            ["labelPath", "a"],
            ["labelPath", "c"],
            ["labelUint64", "myDenseRank"],
            ["window-frame-step-value", 1, 0, -1, true, 1, ["labelPath", "c"]],
            ["window-frame-step-value", 1, 0, 1, false, 1, ["labelPath", "c"]]
        ]),
        vec![frames],
    )
}

fn tracked_expected() -> Vec<Vec<String>> {
    rows(&[
        &["10", "100", "1", "100", "103"],
        &["10", "101", "2", "100", "104"],
        &["10", "102", "2", "100", "104"],
        &["10", "103", "2", "100", "104"],
        &["10", "104", "3", "101", "104"],
        &["20", "200", "1", "200", "202"],
        &["20", "201", "1", "200", "202"],
        &["20", "202", "2", "200", "202"],
        &["30", "300", "1", "300", "302"],
        &["30", "301", "2", "300", "302"],
        &["30", "302", "2", "300", "302"],
    ])
}

#[test]
fn groups_frame_spans_whole_peer_groups() {
    let plan = tracked_plan(json!(["groups", "num", -1, "num", 1, "no-others", 3]));
    assert_eq!(run(&plan), tracked_expected());
}

#[test]
fn range_frame_spans_a_value_interval() {
    let plan = tracked_plan(json!(["range", "num", -1.0, "num", 1.0, "no-others", 1]));
    assert_eq!(run(&plan), tracked_expected());
}

#[test]
fn rows_frame_with_dense_rank_tracking() {
    let order = op(
        "order-offset-limit",
        &["a", "b"],
        json!([
            [["labelPath", "a"], ["labelPath", "b"]],
            ["asc", "asc"]
        ]),
        vec![scan_csv(
            &["a", "b"],
            "10,11\n10,12\n10,12\n10,12\n10,13\n20,20\n20,20\n20,21\n30,30\n30,31\n30,31\n",
        )],
    );
    let partition = op(
        "window-partition",
        &["a", "b", "myDenseRank"],
        json!([0, [["labelPath", "a"], ["labelPath", "b"]], 1, "denseRank"]),
        vec![order],
    );
    let frames = op(
        "window-frames",
        &["a", "b", "myDenseRank"],
        json!([0, 1, [["rows", "num", -1, "num", 1, "no-others", 0]]]),
        vec![partition],
    );
    let plan = op(
        "project",
        &["a", "denseRank", "firstValue", "lastValue"],
        json!([
            ["labelPath", "a"],
            ["labelUint64", "myDenseRank"],
            ["window-frame-step-value", 1, 0, -1, true, 1, ["labelPath", "b"]],
            ["window-frame-step-value", 1, 0, 1, false, 1, ["labelPath", "b"]]
        ]),
        vec![frames],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["10", "1", "11", "12"],
            &["10", "2", "11", "12"],
            &["10", "2", "12", "12"],
            &["10", "2", "12", "13"],
            &["10", "3", "12", "13"],
            &["20", "1", "20", "20"],
            &["20", "1", "20", "21"],
            &["20", "2", "20", "21"],
            &["30", "1", "30", "31"],
            &["30", "2", "30", "31"],
            &["30", "2", "31", "31"],
        ])
    );
}
