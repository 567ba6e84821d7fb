use color_eyre::eyre::{Result, WrapErr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Serialize `value` into a fresh binary file, replacing any existing one.
pub fn write_container<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path)
        .wrap_err_with(|| format!("Unable to create file: {}", path.display()))?;

    let mut writer = BufWriter::new(file);
    bincode::serialize_into(&mut writer, value)
        .wrap_err_with(|| format!("Failed to write binary data to {}", path.display()))?;
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to flush {}", path.display()))?;

    Ok(())
}

/// Read back a value written by [`write_container`].
pub fn read_container<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
    let path = path.as_ref();
    let file =
        File::open(path).wrap_err_with(|| format!("Unable to open file: {}", path.display()))?;

    bincode::deserialize_from(BufReader::new(file))
        .wrap_err_with(|| format!("Failed to decode binary data in {}", path.display()))
}
