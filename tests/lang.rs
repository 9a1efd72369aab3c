//! One test per `tests/programs/*.lox` file, comparing its run against the
//! expectations written in its comments:
//!
//! * `// expect: text` is one line of printed output, in order;
//! * `// error: text` is one reported error, in order, with any line break
//!   in the rendered error replaced by a space.

use std::fs;
use std::path::Path;

use pretty_assertions::assert_eq;
use test_generator::test_resources;

use rox::Session;

const EXPECT: &str = "// expect: ";
const ERROR: &str = "// error: ";

struct Expectations {
    output: Vec<String>,
    errors: Vec<String>,
}

fn expectations(source: &str) -> Expectations {
    let mut output = Vec::new();
    let mut errors = Vec::new();

    for line in source.lines() {
        if let Some(pos) = line.find(EXPECT) {
            output.push(line[pos + EXPECT.len()..].to_string());
        } else if let Some(pos) = line.find(ERROR) {
            errors.push(line[pos + ERROR.len()..].to_string());
        }
    }

    Expectations { output, errors }
}

fn check(path: &Path) {
    let source = fs::read_to_string(path).unwrap();
    let expected = expectations(&source);

    let mut session = Session::with_output(Vec::new());
    let errors: Vec<String> = match session.run(source.as_bytes()) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .iter()
            .map(|e| e.to_string().replace('\n', " "))
            .collect(),
    };

    let printed = String::from_utf8(session.into_output()).unwrap();
    let printed: Vec<String> = printed.lines().map(str::to_string).collect();

    assert_eq!(printed, expected.output, "output of {:?}", path);
    assert_eq!(errors, expected.errors, "errors of {:?}", path);
}

#[test_resources("tests/programs/*.lox")]
fn lox(path: &str) {
    check(Path::new(path));
}
