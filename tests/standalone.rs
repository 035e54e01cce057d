use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use logflow::standalone::{engine::run_job, Job};

const DAY_ONE: &str = "\
web1 s1 alice Mozilla/5.0 (X11; Linux) 01/Oct/2015 10:00:00 GET /products/1 200 512
web1 s1 alice Mozilla/5.0 (X11; Linux) 01/Oct/2015 10:00:05 GET /products/1 200 512
web2 s2 bob curl/7.43 01/Oct/2015 10:01:00 GET /products/2 HTTP/1.1 404 0
truncated line
";

const DAY_TWO: &str = "\
web1 s1 alice Mozilla/5.0 (X11; Linux) 01/Oct/2015 11:00:00 GET /products/1 200 512
web3 s3 carol agent|with|pipes 02/Oct/2015 09:00:00 POST /cart 201 64
";

fn write_inputs(dir: &Path) {
    fs::write(dir.join("day1.log"), DAY_ONE).unwrap();
    fs::write(dir.join("day2.log"), DAY_TWO).unwrap();
    fs::write(dir.join("ignored.txt"), "not matched by the glob\n").unwrap();
}

fn job(dir: &Path, reducers: u32) -> Job {
    Job {
        input: format!("{}/*.log", dir.display()),
        output: dir.join(format!("out-{reducers}")).display().to_string(),
        reducers,
        check_order: true,
    }
}

fn rows(outputs: &[std::path::PathBuf]) -> BTreeSet<String> {
    outputs
        .iter()
        .flat_map(|path| {
            fs::read_to_string(path)
                .unwrap()
                .lines()
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

#[test]
fn counts_requests_across_input_files() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let report = run_job(&job(dir.path(), 1)).unwrap();

    assert_eq!(report.map.lines_read, 6);
    assert_eq!(report.map.records_emitted, 5);
    assert_eq!(report.map.short_lines, 1);
    assert_eq!(report.reduce.records_read, 5);
    assert_eq!(report.reduce.rows_written, 3);
    assert_eq!(report.outputs.len(), 1);
    assert!(report.outputs[0].ends_with("part-00000"));

    let expected: BTreeSet<String> = [
        "alice\ts1\tMozilla/5.0 (X11; Linux)\t01/Oct/2015\tGET /products/1\t200\t3",
        "bob\ts2\tcurl/7.43\t01/Oct/2015\tGET /products/2\t404\t1",
        "carol\ts3\tagent|with|pipes\t02/Oct/2015\tPOST /cart\t201\t1",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    assert_eq!(rows(&report.outputs), expected);
}

#[test]
fn partitioning_does_not_change_the_totals() {
    let dir = tempfile::tempdir().unwrap();
    write_inputs(dir.path());

    let single = run_job(&job(dir.path(), 1)).unwrap();
    let many = run_job(&job(dir.path(), 7)).unwrap();

    assert_eq!(rows(&single.outputs), rows(&many.outputs));
    assert_eq!(many.reduce.rows_written, 3);
    assert!(many.outputs.len() <= 3);
}

#[test]
fn no_matching_input_produces_no_output() {
    let dir = tempfile::tempdir().unwrap();

    let report = run_job(&job(dir.path(), 2)).unwrap();

    assert_eq!(report.map.lines_read, 0);
    assert!(report.outputs.is_empty());
}
