//! A couple of useful type aliases

/// A memory or instruction address of the simulated machine
pub type Address = u32;

/// A machine word
pub type Word = u32;

/// A handy alias for `Result` that carries a generic error type.
pub type Result<T> = ::std::result::Result<T, ::failure::Error>;

/// The file extension of assembly sources
pub const SOURCE_FILE_EXTENSION: &str = "S";

/// The file extension of test-suite case tables
pub const TESTCASE_FILE_EXTENSION: &str = "json";

/// The file extension of test-suite assignment texts
pub const ASSIGNMENT_FILE_EXTENSION: &str = "txt";

/// A diagnostic produced while assembling a program
#[derive(Fail, Debug, Clone, PartialEq, Eq)]
#[fail(display = "Error on line {}: {}", line, message)]
pub struct AsmError {
    /// The 1-indexed source line the error refers to
    pub line: usize,
    /// A human readable description
    pub message: String,
}

impl AsmError {
    /// Creates a new diagnostic for the given line
    pub fn new<S: Into<String>>(line: usize, message: S) -> AsmError {
        AsmError {
            line,
            message: message.into(),
        }
    }
}

#[derive(Fail, Debug)]
#[allow(missing_docs)]
pub enum SessionError {
    #[fail(display = "unable to read {:?}", path)]
    UnreadableFile { path: String },
    #[fail(display = "malformed test cases in {:?}", path)]
    MalformedTestCases { path: String },
    #[fail(display = "no test suite is loaded")]
    NoTestSuite,
    #[fail(display = "test case {} does not exist. Number of test cases: {}", index, count)]
    NoSuchTestCase { index: usize, count: usize },
    #[fail(display = "invalid address {:?}", text)]
    InvalidAddress { text: String },
    #[fail(display = "invalid line number {:?}", text)]
    InvalidLine { text: String },
    #[fail(display = "invalid test case index {:?}", text)]
    InvalidIndex { text: String },
}
