//! Saving and loading checkpoints of trees and buffers.
//!
//! A checkpoint is a plain sequence of fields without any tag, each one encoded
//! with [`bincode`] (little-endian, fixed-size integers). Sequences are prefixed
//! with their length as a `u64`. Saving and loading must visit the fields in the
//! same order.
use crate::error::MemoryError;
use log::info;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

/// Objects that can be written to and restored from a checkpoint stream.
pub trait Checkpoint {
    /// Writes the object into the checkpoint.
    fn save<W: Write>(&self, writer: &mut W) -> Result<(), MemoryError>;

    /// Overwrites the object, configuration included, with the content of the checkpoint.
    ///
    /// On error, the object is left unchanged.
    fn load<R: Read>(&mut self, reader: &mut R) -> Result<(), MemoryError>;

    /// Writes the object into a file.
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        info!("Saved checkpoint in {:?}", path);
        Ok(())
    }

    /// Overwrites the object with the content of a file.
    fn load_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), MemoryError> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        self.load(&mut reader)?;
        info!("Loaded checkpoint from {:?}", path);
        Ok(())
    }
}

/// Writes a single field.
pub(crate) fn write_field<W, T>(writer: &mut W, value: &T) -> Result<(), MemoryError>
where
    W: Write,
    T: Serialize + ?Sized,
{
    bincode::serialize_into(writer, value)?;
    Ok(())
}

/// Reads a single field.
pub(crate) fn read_field<R, T>(reader: &mut R) -> Result<T, MemoryError>
where
    R: Read,
    T: DeserializeOwned,
{
    Ok(bincode::deserialize_from(reader)?)
}

/// Reads a `usize` field, stored as a `u64`.
pub(crate) fn read_usize<R: Read>(reader: &mut R, name: &str) -> Result<usize, MemoryError> {
    let value: u64 = read_field(reader)?;
    if value > usize::MAX as u64 {
        return Err(MemoryError::CorruptCheckpoint(format!(
            "{} = {} does not fit in usize",
            name, value
        )));
    }
    Ok(value as usize)
}

/// Reads a sequence and checks that its length is `expected`.
pub(crate) fn read_vec<R, T>(reader: &mut R, name: &str, expected: usize) -> Result<Vec<T>, MemoryError>
where
    R: Read,
    T: DeserializeOwned,
{
    let values: Vec<T> = read_field(reader)?;
    if values.len() != expected {
        return Err(MemoryError::CorruptCheckpoint(format!(
            "{} has {} elements, expected {}",
            name,
            values.len(),
            expected
        )));
    }
    Ok(values)
}
