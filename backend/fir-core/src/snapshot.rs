//! Saving and restoring a core mid-stream.

use crate::api::FirCore;
use crate::pipeline::FirState;
use bincode::config::{Fixint, LittleEndian};
use bincode::error::{DecodeError, EncodeError};
use fir_config::{ConfigError, FirConfig};
use std::io;
use std::io::{BufReader, BufWriter, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("error saving state: {source}")]
    Serialization {
        #[from]
        source: EncodeError,
    },
    #[error("error loading state: {source}")]
    Deserialization {
        #[from]
        source: DecodeError,
    },
    #[error("saved state has an invalid config: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },
    #[error("I/O error writing state: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

const BINCODE_CONFIG: bincode::config::Configuration<LittleEndian, Fixint> =
    bincode::config::standard().with_little_endian().with_fixed_int_encoding();

/// # Errors
///
/// Returns an error if serialization or the underlying writer fails.
pub fn save_state<W>(core: &FirCore, writer: W) -> Result<(), SnapshotError>
where
    W: io::Write,
{
    let mut writer = BufWriter::new(writer);

    bincode::encode_into_std_write(core.config(), &mut writer, BINCODE_CONFIG)?;
    bincode::encode_into_std_write(core.state(), &mut writer, BINCODE_CONFIG)?;
    bincode::encode_into_std_write(core.cycles(), &mut writer, BINCODE_CONFIG)?;
    writer.flush()?;

    Ok(())
}

/// # Errors
///
/// Returns an error if the data cannot be decoded or holds an invalid config.
pub fn load_state<R>(reader: R) -> Result<FirCore, SnapshotError>
where
    R: io::Read,
{
    let mut reader = BufReader::new(reader);

    let config: FirConfig = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;
    config.validate()?;

    let state: FirState = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;
    let cycles: u64 = bincode::decode_from_std_read(&mut reader, BINCODE_CONFIG)?;

    log::debug!("Loaded FIR core state at cycle {cycles} with {config}");

    Ok(FirCore::from_parts(config, state, cycles))
}
