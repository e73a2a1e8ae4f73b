//! Straight-line pipelines: scan, filter, project, order/offset/limit.

mod support;

use brook_common::BrookError;
use brook_exec::execute;
use brook_exec::vars::Vars;
use serde_json::json;
use support::*;

#[test]
fn filter_on_one_label() {
    let plan = op(
        "filter",
        &["a", "b", "c"],
        json!(["eq", ["labelPath", "b"], ["json", "21"]]),
        vec![scan_csv(&["a", "b", "c"], "10,20,30\n11,21,31\n")],
    );
    assert_eq!(run(&plan), rows(&[&["11", "21", "31"]]));
}

#[test]
fn filter_with_nested_and_or() {
    let plan = op(
        "filter",
        &["a", "b", "c"],
        json!([
            "and",
            ["eq", ["labelPath", "a"], ["json", "10"]],
            [
                "or",
                ["eq", ["labelPath", "c"], ["json", "4444"]],
                ["eq", ["labelPath", "b"], ["json", "20"]]
            ]
        ]),
        vec![scan_csv(&["a", "b", "c"], "10,20,30\n11,21,31\n12,22,32\n")],
    );
    assert_eq!(run(&plan), rows(&[&["10", "20", "30"]]));
}

#[test]
fn filter_output_is_a_subset_of_its_input() {
    let data = "1,2\n3,4\n5,6\n7,8\n";
    let input = run(&scan_csv(&["a", "b"], data));
    let filtered = run(&op(
        "filter",
        &["a", "b"],
        json!(["gt", ["labelPath", "a"], ["json", "3"]]),
        vec![scan_csv(&["a", "b"], data)],
    ));
    assert_eq!(filtered, rows(&[&["5", "6"], &["7", "8"]]));
    for row in &filtered {
        assert!(input.contains(row));
    }
}

#[test]
fn projection_of_all_labels_in_order_is_identity() {
    let data = "00,00,0000\n10,20,3000\n11,21,3000\n";
    let scan = scan_csv(&["a", "b", "c"], data);
    let project = op(
        "project",
        &["a", "b", "c"],
        json!([
            ["labelPath", "a"],
            ["labelPath", "b"],
            ["labelPath", "c"]
        ]),
        vec![scan_csv(&["a", "b", "c"], data)],
    );
    assert_eq!(run(&project), run(&scan));
}

#[test]
fn projection_reorders_and_drops_labels() {
    let plan = op(
        "project",
        &["c", "a"],
        json!([["labelPath", "c"], ["labelPath", "a"]]),
        vec![scan_csv(&["a", "b", "c"], "1,2,3\n4,5,6\n")],
    );
    assert_eq!(run(&plan), rows(&[&["3", "1"], &["6", "4"]]));
}

#[test]
fn projection_of_unknown_label_is_missing() {
    let plan = op(
        "project",
        &["a", "xxx"],
        json!([["labelPath", "a"], ["labelPath", "xxx"]]),
        vec![scan_csv(&["a"], "1\n2\n")],
    );
    assert_eq!(run(&plan), rows(&[&["1", ""], &["2", ""]]));
}

#[test]
fn projection_dives_into_json_documents() {
    let plan = op(
        "project",
        &["city"],
        json!([["labelPath", ".", "addr", "city"]]),
        vec![scan_jsons("{\"addr\": {\"city\": \"sf\"}}\n{\"addr\": {\"city\": \"sj\"}}\n")],
    );
    assert_eq!(run(&plan), rows(&[&["\"sf\""], &["\"sj\""]]));
}

#[test]
fn order_by_single_label() {
    let plan = order_all(
        &["a", "b"],
        scan_csv(&["a", "b"], "30,3\n10,1\n20,2\n"),
    );
    assert_eq!(
        run(&plan),
        rows(&[&["10", "1"], &["20", "2"], &["30", "3"]])
    );
}

#[test]
fn order_by_desc_then_asc() {
    let plan = op(
        "order-offset-limit",
        &["a", "b"],
        json!([
            [["labelPath", "a"], ["labelPath", "b"]],
            ["desc", "asc"]
        ]),
        vec![scan_csv(&["a", "b"], "10,2\n20,9\n10,1\n20,8\n")],
    );
    assert_eq!(
        run(&plan),
        rows(&[&["20", "8"], &["20", "9"], &["10", "1"], &["10", "2"]])
    );
}

#[test]
fn order_ranks_mixed_types_along_the_ladder() {
    let plan = op(
        "order-offset-limit",
        &["a"],
        json!([[["labelPath", "a"]], ["asc"]]),
        vec![scan_csv(&["a"], "\"a21\"\nfalse\n20\nnull\n")],
    );
    assert_eq!(
        run(&plan),
        rows(&[&["null"], &["false"], &["20"], &["\"a21\""]])
    );
}

#[test]
fn order_with_offset_and_limit() {
    let data = "3\n1\n5\n2\n4\n";
    let base = |offset: u64, limit: u64| {
        op(
            "order-offset-limit",
            &["a"],
            json!([[["labelPath", "a"]], ["asc"], offset, limit]),
            vec![scan_csv(&["a"], data)],
        )
    };
    assert_eq!(run(&base(0, 2)), rows(&[&["1"], &["2"]]));
    assert_eq!(run(&base(1, 2)), rows(&[&["2"], &["3"]]));
    assert_eq!(run(&base(4, 10)), rows(&[&["5"]]));
    assert_eq!(run(&base(9, 10)), rows(&[]));
    assert_eq!(run(&base(1, 0)), rows(&[]));
}

#[test]
fn order_without_exprs_is_an_offset_limit_pass() {
    let plan = op(
        "order-offset-limit",
        &["a"],
        json!([null, null, 1, 2]),
        vec![scan_csv(&["a"], "5\n4\n3\n2\n1\n")],
    );
    assert_eq!(run(&plan), rows(&[&["4"], &["3"]]));
}

#[test]
fn order_is_a_permutation_without_offset_or_limit() {
    let data = "2\n2\n9\n1\n9\n2\n";
    let mut input = run(&scan_csv(&["a"], data));
    let mut sorted = run(&order_all(&["a"], scan_csv(&["a"], data)));
    assert_eq!(sorted.len(), input.len());
    input.sort();
    let output = sorted.clone();
    sorted.sort();
    assert_eq!(input, sorted);
    // And the emitted order respects the key.
    let keys: Vec<&str> = output.iter().map(|r| r[0].as_str()).collect();
    assert_eq!(keys, vec!["1", "2", "2", "2", "9", "9"]);
}

#[test]
fn order_ties_keep_arrival_order() {
    let plan = op(
        "order-offset-limit",
        &["a", "b"],
        json!([[["labelPath", "a"]], ["asc"]]),
        vec![scan_csv(&["a", "b"], "1,first\n2,x\n1,second\n1,third\n")],
    );
    assert_eq!(
        run(&plan),
        rows(&[
            &["1", "first"],
            &["1", "second"],
            &["1", "third"],
            &["2", "x"]
        ])
    );
}

#[test]
fn consumer_errors_cancel_the_pipeline() {
    let plan = scan_csv(&["a"], "1\n2\n3\n");
    let vars = Vars::from_config(test_config("brook_cancel"));
    let mut seen = 0usize;
    let err = execute(&plan, &vars, |_| {
        seen += 1;
        if seen == 2 {
            Err(BrookError::Cancelled("stop".to_string()))
        } else {
            Ok(())
        }
    })
    .expect_err("cancelled");
    assert!(matches!(err, BrookError::Cancelled(_)));
    assert_eq!(seen, 2);
}

#[test]
fn empty_projection_still_counts_rows() {
    let plan = op(
        "project",
        &[],
        json!([]),
        vec![scan_csv(&["a"], "1\n2\n")],
    );
    assert_eq!(run(&plan), rows(&[&[], &[]]));
}
