mod common;

use std::fs;

use common::{KV_TSV, TestWorkspace, path_arg, tabpipe};
use predicates::prelude::*;
use predicates::str::contains;

#[test]
fn histogram_counts_keys_in_ascending_order() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["process", "-i", path_arg(&input), "k", ".hist"])
        .assert()
        .success()
        .stdout("k\tcount\nb\t1\na\t2\n");
}

#[test]
fn select_keeps_rows_in_input_order() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["process", "-i", path_arg(&input), "k", "v", "?_>1"])
        .assert()
        .success()
        .stdout("k\tv\nb\t2\na\t3\n");
    tabpipe()
        .args(["process", "-i", path_arg(&input), "v", "?_>1"])
        .assert()
        .success()
        .stdout("v\n2\n3\n");
}

#[test]
fn aggregate_replaces_the_column_with_statistics() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&input),
            "--output-delimiter",
            ",",
            "k",
            "v",
            ".agg",
        ])
        .assert()
        .success()
        .stdout("k,v.min,v.mean,v.stddev,v.max,v.sum\na,1,2.0,1.0,3,4\nb,2,2.0,0.0,2,2\n");
}

#[test]
fn descending_sort_with_row_numbers_and_header_override() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&input),
            "--row-numbers",
            "--header",
            "key,value",
            "k",
            "v",
            ".sort-",
        ])
        .assert()
        .success()
        .stdout("#\tkey\tvalue\n1\ta\t3\n2\tb\t2\n3\ta\t1\n");
}

#[test]
fn join_keeps_unmatched_rows_from_both_sides() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.csv", "id,name\n1,x\n");
    let right = workspace.write("right.csv", "id,score\n2,y\n");
    tabpipe()
        .args([
            "join",
            "-i",
            path_arg(&left),
            "-i",
            path_arg(&right),
            "--key",
            "id",
            "--output-delimiter",
            ",",
            "--absent",
            "-",
        ])
        .assert()
        .success()
        .stdout("0.id,0.name,1.id,1.score\n1,x,-,-\n-,-,2,y\n");
}

#[test]
fn join_runs_operations_on_the_joined_table() {
    let workspace = TestWorkspace::new();
    let left = workspace.write("left.tsv", "id\tname\n1\tann\n2\tbob\n");
    let right = workspace.write("right.tsv", "uid\tscore\n2\t9\n1\t4\n");
    tabpipe()
        .args([
            "join",
            "-i",
            path_arg(&left),
            "-i",
            path_arg(&right),
            "--key",
            "id",
            "--right-key",
            "uid",
            "0.name",
            "1.score",
            ".sort",
        ])
        .assert()
        .success()
        .stdout("0.name\t1.score\nann\t4\nbob\t9\n");
}

#[test]
fn join_needs_two_inputs() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["join", "-i", path_arg(&input), "--key", "k"])
        .assert()
        .failure()
        .stderr(contains("at least two"));
}

#[test]
fn concatenation_tags_each_row_with_its_source() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("first.tsv", "k\tv\na\t1\n");
    let second = workspace.write("second.tsv", "k\tv\nb\t2\n");
    let assert = tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&first),
            "-i",
            path_arg(&second),
            "--tag-source=file",
        ])
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let lines = stdout.lines().collect::<Vec<_>>();
    assert_eq!(lines[0], "file\tk\tv");
    assert!(lines[1].ends_with("first.tsv\ta\t1"));
    assert!(lines[2].ends_with("second.tsv\tb\t2"));
}

#[test]
fn concatenation_rejects_mismatched_headers() {
    let workspace = TestWorkspace::new();
    let first = workspace.write("first.tsv", "k\tv\na\t1\n");
    let second = workspace.write("second.tsv", "k\tw\nb\t2\n");
    tabpipe()
        .args(["process", "-i", path_arg(&first), "-i", path_arg(&second)])
        .assert()
        .failure()
        .stderr(contains("header mismatch: expected [k, v] but found [k, w]"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn unknown_columns_list_the_available_headers() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["process", "-i", path_arg(&input), "missing"])
        .assert()
        .failure()
        .stderr(contains("available: k, v"));
}

#[test]
fn malformed_expressions_fail_before_output() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["process", "-i", path_arg(&input), "v", "?_ > 1)"])
        .assert()
        .failure()
        .stderr(contains("cannot compile"))
        .stdout(predicate::str::is_empty());
    tabpipe()
        .args(["process", "-i", path_arg(&input), ".sort"])
        .assert()
        .failure()
        .stderr(contains("no column specified"));
}

#[test]
fn key_value_input_from_stdin_pads_missing_fields() {
    tabpipe()
        .args(["process", "-i", "-", "--absent", "NA"])
        .write_stdin("a=1 b=2\nb=3\nc=4\n")
        .assert()
        .success()
        .stdout("a\tb\tc\n1\t2\tNA\nNA\t3\tNA\nNA\tNA\t4\n");
}

#[test]
fn json_lines_honour_field_selection() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "events.jsonl",
        "{\"user\":\"ann\",\"n\":3,\"extra\":true}\n{\"n\":5,\"user\":\"bob\"}\n",
    );
    tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&input),
            "--fields",
            "n,user",
            "user",
            "n",
            ".agg",
        ])
        .assert()
        .success()
        .stdout("user\tn.min\tn.mean\tn.stddev\tn.max\tn.sum\nann\t3\t3.0\t0.0\t3\t3\nbob\t5\t5.0\t0.0\t5\t5\n");
}

#[test]
fn headerless_space_input_synthesizes_names() {
    tabpipe()
        .args(["process", "-i", "-", "--no-header", "--limit", "2", "col1", "col0"])
        .write_stdin("x 1\ny 2\nz 3\n")
        .assert()
        .success()
        .stdout("col1\tcol0\n1\tx\n2\ty\n");
}

#[test]
fn aligned_and_blowup_modes() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    tabpipe()
        .args(["process", "-i", path_arg(&input), "--table", "--limit", "1"])
        .assert()
        .success()
        .stdout("k    v\n---  ---\na    1\n");
    tabpipe()
        .args(["process", "-i", path_arg(&input), "--blowup", "--limit", "1"])
        .assert()
        .success()
        .stdout("--- row 1 ---\nk: a\nv: 1\n");
}

#[test]
fn output_file_receives_rendered_rows() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", KV_TSV);
    let output = workspace.path().join("out.tsv");
    tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&input),
            "-o",
            path_arg(&output),
            "--omit-header",
            "k",
            "=a",
        ])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
    assert_eq!(fs::read_to_string(&output).expect("read output"), "a\na\n");
}

#[test]
fn legacy_encodings_are_decoded() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_bytes("latin.csv", b"name,city\nJos\xe9,M\xe1laga\n");
    tabpipe()
        .args([
            "process",
            "-i",
            path_arg(&input),
            "--input-encoding",
            "latin1",
            "city",
        ])
        .assert()
        .success()
        .stdout("city\nMálaga\n");
}

#[test]
fn columns_lists_index_name_and_sample() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("kv.tsv", "k\tv\n\t1\nb\t2\n");
    tabpipe()
        .args(["columns", "-i", path_arg(&input)])
        .assert()
        .success()
        .stdout(contains("0    k     b"))
        .stdout(contains("1    v     1"));
}
