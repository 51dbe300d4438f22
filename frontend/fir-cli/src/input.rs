//! Sample stream text format: integers separated by whitespace or commas, `#` starts a comment.
//!
//! A token prefixed with `0b` is a raw input bus pattern of exactly [`SAMPLE_BITS`] bits.

use anyhow::anyhow;
use fir_common::sample::SAMPLE_BITS;
use fir_core::Sample;

fn parse_bus_pattern(digits: &str) -> Option<Sample> {
    if digits.len() != usize::from(SAMPLE_BITS) {
        return None;
    }

    u8::from_str_radix(digits, 2).ok().map(Sample::from_bits)
}

/// # Errors
///
/// Returns an error on the first token that is not an integer, or that is out of sample range
/// when `clip` is not set.
pub fn parse_samples(text: &str, clip: bool) -> anyhow::Result<Vec<Sample>> {
    let mut samples = Vec::new();
    let mut clipped = 0_usize;

    for (line_idx, line) in text.lines().enumerate() {
        let line = line.split_once('#').map_or(line, |(before, _)| before);

        for token in line.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()) {
            if let Some(digits) = token.strip_prefix("0b") {
                let sample = parse_bus_pattern(digits).ok_or_else(|| {
                    anyhow!("line {}: invalid {SAMPLE_BITS}-bit bus pattern '{token}'", line_idx + 1)
                })?;
                samples.push(sample);
                continue;
            }

            let value: i32 = token
                .parse()
                .map_err(|err| anyhow!("line {}: invalid sample '{token}': {err}", line_idx + 1))?;

            let sample = if clip {
                let sample = Sample::saturating(value);
                if i32::from(sample) != value {
                    clipped += 1;
                }
                sample
            } else {
                Sample::new(value).map_err(|err| anyhow!("line {}: {err}", line_idx + 1))?
            };

            samples.push(sample);
        }
    }

    if clipped != 0 {
        log::warn!("Clipped {clipped} out-of-range samples");
    }

    Ok(samples)
}
