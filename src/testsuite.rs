//! Batch runs of a program against `(input, expected output)` pairs.
//!
//! A test suite consists of three files sharing a base name: `<base>.S` holds the assembly
//! prefix appended after the user's code (usually a `_start` that calls into it), `<base>.json`
//! holds the cases and `<base>.txt` the assignment text. Each case's input is appended to the
//! prefix as assembly, so a case can feed data through labels such as `input_value: .word 5`.

use crate::engine::Engine;
use crate::session::Session;
use crate::state::Status;
use crate::typedef::*;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One input with its expected output
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    /// Assembly appended after the test prefix
    pub input: String,
    /// The expected console output
    pub output: String,
}

/// A loaded test suite
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestData {
    /// The assignment text shown to the user
    pub assignment: String,
    /// Assembly appended after the user's code
    pub test_prefix: String,
    /// The cases, in order
    pub testcases: Vec<TestCase>,
}

/// The outcome of one case
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    /// The case's input
    pub input: String,
    /// The expected output
    pub output: String,
    /// What the program printed, trimmed
    pub user_output: String,
    /// Whether the run ended in a runtime error
    pub run_err: bool,
}

impl TestResult {
    /// Whether the run was clean and printed what was expected
    pub fn passed(&self) -> bool {
        !self.run_err && self.user_output == self.output.trim()
    }
}

fn with_extension(base: &Path, extension: &str) -> PathBuf {
    let mut path = OsString::from(base.as_os_str());
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

fn read(path: &Path) -> Result<String> {
    let text = fs::read_to_string(path).map_err(|_| SessionError::UnreadableFile {
        path: path.display().to_string(),
    })?;

    Ok(text)
}

impl TestData {
    /// Creates a suite from a prefix and its cases
    pub fn new<S: Into<String>>(test_prefix: S, testcases: Vec<TestCase>) -> TestData {
        TestData {
            assignment: String::new(),
            test_prefix: test_prefix.into(),
            testcases,
        }
    }

    /// Loads `<base>.S`, `<base>.json` and `<base>.txt`
    pub fn from_files<P: AsRef<Path>>(base: P) -> Result<TestData> {
        let base = base.as_ref();

        let test_prefix = read(&with_extension(base, SOURCE_FILE_EXTENSION))?;

        let json_path = with_extension(base, TESTCASE_FILE_EXTENSION);
        let testcases = serde_json::from_str(&read(&json_path)?).map_err(|_| {
            SessionError::MalformedTestCases {
                path: json_path.display().to_string(),
            }
        })?;

        let assignment = read(&with_extension(base, ASSIGNMENT_FILE_EXTENSION))?
            .trim()
            .to_owned();

        Ok(TestData {
            assignment,
            test_prefix,
            testcases,
        })
    }

    /// The assembly appended to the user's code for the given case
    pub fn suffix(&self, index: usize) -> Option<String> {
        self.testcases
            .get(index)
            .map(|case| format!("{}{}", self.test_prefix, case.input))
    }
}

impl<E: Engine> Session<E> {
    /// Installs a test suite; later lint builds include its first case
    pub fn load_test_data(&mut self, data: TestData) {
        info!(cases = data.testcases.len(), "test suite loaded");
        self.test_data = Some(data);
        self.test_results.clear();
        self.test_index = None;
    }

    /// The installed test suite
    pub fn test_data(&self) -> Option<&TestData> {
        self.test_data.as_ref()
    }

    /// The table of the last harness run
    pub fn test_results(&self) -> &[TestResult] {
        &self.test_results
    }

    /// The case picked by the last `start_step_test_case`
    pub fn test_index(&self) -> Option<usize> {
        self.test_index
    }

    /// Runs every case to completion. Returns `false` if no suite is installed. An assembly
    /// error stops the harness and leaves the session in `AsmError`.
    pub fn run_test_suite(&mut self, text: &str) -> bool {
        let data = match self.test_data {
            Some(ref data) => data.clone(),
            None => return false,
        };

        let mut table = Vec::with_capacity(data.testcases.len());

        for (index, case) in data.testcases.iter().enumerate() {
            debug!(index, "running test case");

            let suffix = format!("{}{}", data.test_prefix, case.input);
            if !self.build_with_suffix(text, &suffix) {
                return true;
            }

            let engine = self.adapter.engine();
            let running = Status::Running {
                pc: engine.pc(),
                regs: *engine.regs(),
                console_text: String::new(),
            };
            self.set_status(running);

            self.run_to_end();

            table.push(TestResult {
                input: case.input.clone(),
                output: case.output.clone(),
                user_output: self.adapter.console().trim().to_owned(),
                run_err: !self.adapter.exited(),
            });
        }

        info!(
            passed = table.iter().filter(|result| result.passed()).count(),
            total = table.len(),
            "test suite finished"
        );

        self.test_results = table.clone();
        self.set_status(Status::TestSuite { table });

        true
    }

    /// Builds one case and pauses at the first instruction that belongs to the user's code
    pub fn start_step_test_case(&mut self, index: usize, text: &str) -> Result<()> {
        let suffix = {
            let data = self.test_data.as_ref().ok_or(SessionError::NoTestSuite)?;

            data.suffix(index).ok_or(SessionError::NoSuchTestCase {
                index,
                count: data.testcases.len(),
            })?
        };

        self.test_index = Some(index);

        if !self.build_with_suffix(text, &suffix) {
            return Ok(());
        }

        self.breakpoints.disarm();

        let user_lines = text.lines().count() as u32;
        while !self.adapter.finished() {
            let pc = self.adapter.engine().pc();
            if self.adapter.line_at(pc).map_or(false, |line| line <= user_lines) {
                break;
            }

            self.adapter.run_one_instruction();
        }

        debug!(
            index,
            executed = self.adapter.executed(),
            "reached user code"
        );

        if self.adapter.exited() {
            self.adapter.append_success();
        }
        self.update_state();

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passing_requires_a_clean_run() {
        let mut result = TestResult {
            input: "5".into(),
            output: "25\n".into(),
            user_output: "25".into(),
            run_err: false,
        };
        assert!(result.passed());

        result.run_err = true;
        assert!(!result.passed());

        result.run_err = false;
        result.user_output = "24".into();
        assert!(!result.passed());
    }

    #[test]
    fn results_serialize_like_the_table() {
        let result = TestResult {
            input: "1".into(),
            output: "1".into(),
            user_output: "1".into(),
            run_err: false,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["userOutput"], "1");
        assert_eq!(json["runErr"], false);
    }

    #[test]
    fn suffix_joins_prefix_and_input() {
        let data = TestData::new(
            "input_value: .word ",
            vec![TestCase {
                input: "3\n".into(),
                output: "9".into(),
            }],
        );

        assert_eq!(data.suffix(0).unwrap(), "input_value: .word 3\n");
        assert_eq!(data.suffix(1), None);
    }

    #[test]
    fn without_a_suite() {
        let mut session: Session = Session::default();

        assert!(!session.run_test_suite("nop\n"));
        assert!(session.start_step_test_case(0, "nop\n").is_err());
        assert_eq!(session.status(), &Status::Idle);
    }
}
