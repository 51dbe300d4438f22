use clap::Parser;
use env_logger::Env;
use fir_core::{FirConfig, FirCore, OutputMode, Sample, SplitReassembler};
use serde::Deserialize;
use std::error::Error;
use std::ffi::OsStr;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::{fs, process};

const DEFAULT_RESET_CYCLES: u32 = 10;

fn default_reset_cycles() -> u32 {
    DEFAULT_RESET_CYCLES
}

#[derive(Debug, Clone, Deserialize)]
struct TestDescription {
    name: String,
    #[serde(default)]
    config: FirConfig,
    #[serde(default = "default_reset_cycles")]
    reset_cycles: u32,
    inputs: Vec<Sample>,
    // Bus value per cycle in standard mode, reassembled result per pair in split mode
    expected: Vec<i32>,
}

#[derive(Debug, Clone, Parser)]
struct Args {
    /// JSON file containing an array of tests
    #[arg(short = 'f', long)]
    file_path: Option<String>,
    /// Directory of JSON test files; every *.json file is run in name order
    #[arg(short = 'd', long)]
    directory_path: Option<String>,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let failures = match (args.file_path, args.directory_path) {
        (Some(file_path), None) => run_test(&file_path)?,
        (None, Some(directory_path)) => run_directory(&directory_path)?,
        _ => {
            eprintln!(
                "ERROR: Exactly one of -f and -d must be set; use -h to see full help output"
            );
            process::exit(1);
        }
    };

    if failures != 0 {
        log::error!("{failures} test(s) failed");
        process::exit(1);
    }

    log::info!("All tests passed");

    Ok(())
}

fn run_directory(directory_path: &str) -> Result<usize, Box<dyn Error>> {
    let mut file_paths: Vec<_> = fs::read_dir(directory_path)?
        .filter_map(Result::ok)
        .filter_map(|dir_entry| {
            let path = dir_entry.path();
            (path.extension().and_then(OsStr::to_str) == Some("json")).then_some(path)
        })
        .collect();

    file_paths.sort();

    let mut failures = 0;
    for file_path in file_paths {
        failures += run_test(&file_path)?;
    }

    Ok(failures)
}

fn run_test<P: AsRef<Path>>(file_path: P) -> Result<usize, Box<dyn Error>> {
    let file_path = file_path.as_ref();

    let file = File::open(file_path)?;
    let test_descriptions: Vec<TestDescription> = serde_json::from_reader(BufReader::new(file))?;
    let num_tests = test_descriptions.len();

    let mut failures = 0;
    for test_description in &test_descriptions {
        let errors = check_test(test_description);
        if !errors.is_empty() {
            failures += 1;

            log::error!("Failed test '{}':", test_description.name);
            for error in errors {
                log::error!("  {error}");
            }
        }
    }

    if failures != 0 {
        log::info!("Failed {failures} out of {num_tests} in '{}'", file_path.display());
    } else {
        log::info!("Passed {num_tests} tests in '{}'", file_path.display());
    }

    Ok(failures)
}

fn check_test(test: &TestDescription) -> Vec<String> {
    let mut core = match FirCore::new(test.config) {
        Ok(core) => core,
        Err(err) => return vec![format!("Invalid config: {err}")],
    };

    core.hold_reset(test.reset_cycles);
    let words = core.run(test.inputs.iter().copied());

    let mut errors = Vec::new();

    // Full-width words pass through the reassembler unchanged, so both modes compare results
    let mut reassembler = SplitReassembler::new();
    let mut actual = Vec::with_capacity(test.expected.len());
    for (cycle, word) in words.into_iter().enumerate() {
        match reassembler.push(word) {
            Ok(Some(value)) => actual.push(i32::from(value)),
            Ok(None) => {}
            Err(err) => errors.push(format!("Cycle {cycle}: {err}")),
        }
    }

    let label = match test.config.output_mode {
        OutputMode::Standard => "Cycle",
        OutputMode::Split => "Result",
    };

    if actual.len() != test.expected.len() {
        errors.push(format!(
            "{label} count: actual={}, expected={}",
            actual.len(),
            test.expected.len()
        ));
    }

    for (i, (actual_value, expected_value)) in actual.iter().zip(&test.expected).enumerate() {
        if actual_value != expected_value {
            errors.push(format!("{label} {i}: actual={actual_value}, expected={expected_value}"));
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn check_vectors(json: &str) {
        let tests: Vec<TestDescription> = serde_json::from_str(json).unwrap();
        assert!(!tests.is_empty());

        for test in &tests {
            let errors = check_test(test);
            assert!(errors.is_empty(), "{}: {errors:?}", test.name);
        }
    }

    #[test]
    fn standard_vectors() {
        check_vectors(include_str!("../vectors/standard.json"));
    }

    #[test]
    fn split_vectors() {
        check_vectors(include_str!("../vectors/split.json"));
    }

    #[test]
    fn wrong_expectation_is_reported() {
        let json = r#"[{"name": "off", "inputs": [31, 31], "expected": [0, 1]}]"#;
        let tests: Vec<TestDescription> = serde_json::from_str(json).unwrap();
        assert_eq!(tests[0].reset_cycles, DEFAULT_RESET_CYCLES);

        let errors = check_test(&tests[0]);
        assert_eq!(errors, vec!["Cycle 1: actual=0, expected=1".to_owned()]);
    }

    #[test]
    fn out_of_range_input_fails_to_parse() {
        let json = r#"[{"name": "range", "inputs": [32], "expected": [0]}]"#;
        assert!(serde_json::from_str::<Vec<TestDescription>>(json).is_err());
    }

    #[test]
    fn invalid_config_is_reported() {
        let json = r#"[{
            "name": "width",
            "config": {"output_mode": "Split", "split_bus_width": 4},
            "inputs": [],
            "expected": []
        }]"#;
        let tests: Vec<TestDescription> = serde_json::from_str(json).unwrap();

        let errors = check_test(&tests[0]);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Invalid config"), "{errors:?}");
    }
}
