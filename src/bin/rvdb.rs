#[macro_use]
extern crate failure;
#[macro_use]
extern crate structopt;

use failure::ResultExt;
use rvdb::typedef::*;
use rvdb::{Debugger, Session, Status, TestData, INSTRUCTION_LIMIT};
use std::fs;
use std::path::PathBuf;
use structopt::StructOpt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(StructOpt, Debug)]
#[structopt(name = "rvdb", about = "A stepping, reversible debugger for RISC-V assembly")]
struct Opt {
    /// The assembly source file
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// Base path of a test suite (<base>.S, <base>.json and <base>.txt)
    #[structopt(long = "testsuite", parse(from_os_str))]
    testsuite: Option<PathBuf>,

    /// Maximum number of instructions per run
    #[structopt(long = "limit", default_value = "100000")]
    limit: usize,

    /// Run the program to completion and exit
    #[structopt(long = "run")]
    run: bool,

    /// Run the test suite and exit
    #[structopt(long = "test")]
    test: bool,

    /// Print test results as JSON
    #[structopt(long = "json")]
    json: bool,

    /// Verbosity of the log output (-v, -vv, -vvv)
    #[structopt(short = "v", parse(from_occurrences))]
    verbose: u8,
}

fn main() {
    match run() {
        Ok(code) => ::std::process::exit(code),
        Err(e) => {
            eprintln!("{}", e);
            ::std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_writer(::std::io::stderr))
        .init();
}

fn run() -> Result<i32> {
    let opts = Opt::from_args();
    init_logging(opts.verbose);

    let limit = if opts.limit == 0 {
        INSTRUCTION_LIMIT
    } else {
        opts.limit
    };
    let mut session: Session = Session::default().with_instruction_limit(limit);

    if let Some(ref base) = opts.testsuite {
        let data = TestData::from_files(base)?;
        if !data.assignment.is_empty() {
            println!("{}", data.assignment);
            println!();
        }
        session.load_test_data(data);
    }

    if opts.run || opts.test {
        let text = fs::read_to_string(&opts.file)
            .with_context(|_| format!("unable to read {}", opts.file.display()))?;

        if opts.test {
            ensure!(session.run_test_suite(&text), "no test suite given, use --testsuite");
        } else {
            session.run_normal(&text);
        }

        return report(&session, opts.json);
    }

    Debugger::new(session, opts.file).run()?;

    Ok(0)
}

fn report(session: &Session, json: bool) -> Result<i32> {
    match session.status() {
        Status::TestSuite { table } => {
            if json {
                println!("{}", serde_json::to_string_pretty(table)?);
            } else {
                for (i, result) in table.iter().enumerate() {
                    let verdict = if result.passed() { "PASS" } else { "FAIL" };
                    println!("#{} {} {:?}", i, verdict, result.user_output);
                }
            }

            Ok(if table.iter().all(|result| result.passed()) {
                0
            } else {
                1
            })
        }
        Status::Stopped { console_text, .. } => {
            println!("{}", console_text);
            Ok(0)
        }
        other => {
            println!("{}", other.console_text());
            Ok(1)
        }
    }
}
