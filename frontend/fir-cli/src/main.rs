mod input;

use anyhow::anyhow;
use clap::Parser;
use env_logger::Env;
use fir_common::num;
use fir_common::sample::SAMPLE_BITS;
use fir_config::{CoefficientSet, OUTPUT_BITS};
use fir_core::{
    BusPhase, FirConfig, FirCore, OutputMode, OutputWord, Sample, SplitReassembler, snapshot,
};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::PathBuf;
use std::{fs, io};

const CORE_OPTIONS_HEADING: &str = "Core Options";
const OUTPUT_OPTIONS_HEADING: &str = "Output Options";

#[derive(Debug, Parser)]
struct Args {
    /// Input sample file, or - for stdin; integers in -32..=31 separated by whitespace or commas
    #[arg(short = 'f', long)]
    input_file: String,

    /// TOML config file; command-line options override its values
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Comma-separated coefficients, newest tap first (e.g. 8,8,8,8)
    #[arg(long, help_heading = CORE_OPTIONS_HEADING)]
    coefficients: Option<CoefficientSet>,

    /// Register each input for one extra cycle before it enters the delay line (true / false);
    /// the bare flag means true
    #[arg(
        long,
        num_args = 0..=1,
        default_missing_value = "true",
        help_heading = CORE_OPTIONS_HEADING
    )]
    input_register: Option<bool>,

    /// Output bus protocol
    #[arg(long, value_enum, help_heading = CORE_OPTIONS_HEADING)]
    output_mode: Option<OutputMode>,

    /// Bus width in split mode (5-8)
    #[arg(long, help_heading = CORE_OPTIONS_HEADING)]
    split_bus_width: Option<u8>,

    /// Cycles to hold reset before streaming; ignored when loading a saved state
    #[arg(long, default_value_t = 10)]
    reset_cycles: u32,

    /// Clip out-of-range input samples instead of failing
    #[arg(long, default_value_t)]
    clip: bool,

    /// Append zero samples after the input so that every input's result reaches the bus
    #[arg(long, default_value_t, help_heading = OUTPUT_OPTIONS_HEADING)]
    flush: bool,

    /// Print bus words as bit strings
    #[arg(long, default_value_t, help_heading = OUTPUT_OPTIONS_HEADING)]
    binary: bool,

    /// Continue from a previously saved core state instead of starting from reset
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Save the core state after the last sample
    #[arg(long)]
    save_state: Option<PathBuf>,
}

impl Args {
    fn has_core_overrides(&self) -> bool {
        self.config.is_some()
            || self.coefficients.is_some()
            || self.input_register.is_some()
            || self.output_mode.is_some()
            || self.split_bus_width.is_some()
    }

    fn fir_config(&self) -> anyhow::Result<FirConfig> {
        let config = match &self.config {
            Some(path) => {
                let s = fs::read_to_string(path).map_err(|err| {
                    anyhow!("Error reading config file '{}': {err}", path.display())
                })?;
                FirConfig::from_toml_str(&s)
                    .map_err(|err| anyhow!("Invalid config file '{}': {err}", path.display()))?
            }
            None => FirConfig::default(),
        };

        Ok(self.apply_overrides(config))
    }

    fn apply_overrides(&self, mut config: FirConfig) -> FirConfig {
        if let Some(coefficients) = self.coefficients {
            config.coefficients = coefficients;
        }
        if let Some(input_register) = self.input_register {
            config.input_register = input_register;
        }
        if let Some(output_mode) = self.output_mode {
            config.output_mode = output_mode;
        }
        if let Some(split_bus_width) = self.split_bus_width {
            config.split_bus_width = split_bus_width;
        }

        config
    }

    fn create_core(&self) -> anyhow::Result<FirCore> {
        if let Some(path) = &self.load_state {
            if self.has_core_overrides() {
                log::warn!("Core options are ignored when loading a saved state");
            }

            let file = File::open(path)
                .map_err(|err| anyhow!("Error opening state file '{}': {err}", path.display()))?;
            let core = snapshot::load_state(file)?;
            log::info!("Resuming at cycle {} with {}", core.cycles(), core.config());

            return Ok(core);
        }

        let mut core = FirCore::new(self.fir_config()?)?;
        core.hold_reset(self.reset_cycles);
        log::info!("Running with {} (latency {} cycles)", core.config(), core.latency());

        Ok(core)
    }
}

fn read_input(input_file: &str) -> anyhow::Result<String> {
    let mut text = String::new();
    if input_file == "-" {
        io::stdin().read_to_string(&mut text)?;
    } else {
        text = fs::read_to_string(input_file)
            .map_err(|err| anyhow!("Error reading input file '{input_file}': {err}"))?;
    }

    Ok(text)
}

fn format_sample(sample: Sample, binary: bool) -> String {
    if binary {
        num::raw_bit_string(sample.to_bits().into(), SAMPLE_BITS)
    } else {
        sample.to_string()
    }
}

fn format_word(word: OutputWord, binary: bool) -> String {
    if binary { word.bit_string() } else { word.to_string() }
}

fn format_result(value: i16, binary: bool) -> anyhow::Result<String> {
    if binary {
        Ok(num::encode_twos_complement(value.into(), OUTPUT_BITS)?)
    } else {
        Ok(value.to_string())
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut samples = input::parse_samples(&read_input(&args.input_file)?, args.clip)?;
    let mut core = args.create_core()?;

    if args.flush {
        samples.resize(samples.len() + core.latency(), Sample::ZERO);
    }

    log::info!("Streaming {} samples", samples.len());

    let split = core.config().output_mode == OutputMode::Split;
    let mut reassembler = SplitReassembler::new();

    // The high half of this pair went out before the state was saved
    let mut skip_orphan_lsb = split && core.state().bus_phase() == BusPhase::Lsb;
    if skip_orphan_lsb {
        log::info!("Saved state resumes on the low half of a split result");
    }

    let mut stdout = BufWriter::new(io::stdout().lock());
    for sample in samples {
        let cycle = core.cycles();
        let word = core.clock(sample);

        write!(
            stdout,
            "{cycle}\t{}\t{}",
            format_sample(sample, args.binary),
            format_word(word, args.binary)
        )?;

        if skip_orphan_lsb {
            skip_orphan_lsb = false;
        } else if split {
            match reassembler.push(word) {
                Ok(Some(value)) => write!(stdout, "\t= {}", format_result(value, args.binary)?)?,
                Ok(None) => {}
                Err(err) => log::warn!("Cycle {cycle}: {err}"),
            }
        }

        writeln!(stdout)?;
    }
    stdout.flush()?;

    if reassembler.is_waiting_for_lsb() {
        log::info!("Stream ended between the two halves of a split result");
    }

    if let Some(path) = &args.save_state {
        let file = File::create(path)
            .map_err(|err| anyhow!("Error creating state file '{}': {err}", path.display()))?;
        snapshot::save_state(&core, file)?;
        log::info!("Saved core state at cycle {} to '{}'", core.cycles(), path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn parse_args(flags: &[&str]) -> Args {
        let argv = ["fir-cli", "-f", "-"].into_iter().chain(flags.iter().copied());
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn input_register_overrides_file_both_ways() {
        let from_file = FirConfig { input_register: true, ..FirConfig::default() };

        let config = parse_args(&["--input-register", "false"]).apply_overrides(from_file);
        assert!(!config.input_register);

        let config = parse_args(&["--input-register=false"]).apply_overrides(from_file);
        assert!(!config.input_register);

        let config = parse_args(&[]).apply_overrides(from_file);
        assert!(config.input_register);

        let config = parse_args(&["--input-register"]).apply_overrides(FirConfig::default());
        assert!(config.input_register);
    }

    #[test]
    fn core_flags_override_file_values() {
        let args = parse_args(&[
            "--coefficients",
            "31,-32,16,-7",
            "--output-mode",
            "split",
            "--split-bus-width",
            "7",
        ]);
        assert!(args.has_core_overrides());

        let config = args.apply_overrides(FirConfig::default());
        assert_eq!(config.coefficients.to_i32_array(), [31, -32, 16, -7]);
        assert_eq!(config.output_mode, OutputMode::Split);
        assert_eq!(config.split_bus_width, 7);
        assert!(!config.input_register);
    }

    #[test]
    fn invalid_bool_is_rejected() {
        assert!(Args::try_parse_from(["fir-cli", "-f", "-", "--input-register", "maybe"]).is_err());
    }
}
