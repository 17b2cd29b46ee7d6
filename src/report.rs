//! CSV report files.
//!
//! A report is a serializable row type. Each report type is registered once
//! with [`ReportWriter::add_report`], which opens `<prefix><short_name>.csv`
//! in the configured directory, and rows are written with `send_report`.
use std::any::TypeId;
use std::ffi::OsStr;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{debug, trace};

use crate::error::SimulationError;
use crate::hashing::HashMap;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), SimulationError>;
}

/// Use this macro to define a unique report type
#[macro_export]
macro_rules! create_report_trait {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::SimulationError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}
pub use create_report_trait;

/// Where report files go and how they are named.
#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub directory: PathBuf,
    pub file_prefix: String,
    /// Replace existing files instead of failing.
    pub overwrite: bool,
}

impl ReportOptions {
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> ReportOptions {
        ReportOptions {
            directory: directory.into(),
            file_prefix: String::new(),
            overwrite: true,
        }
    }
}

// Checks that the path is valid. Creates the file and all parent directories if
// they do not exist. Returns the file if successful. Called by `add_report`
fn generate_validate_filepath(path: &Path, overwrite: bool) -> Result<File, SimulationError> {
    match path.extension().and_then(OsStr::to_str) {
        Some("csv") => {
            if let Some(parent) = path.parent() {
                create_dir_all(parent)?;
            }
            if !overwrite && path.exists() {
                return Err(SimulationError::ReportError(format!(
                    "{} already exists",
                    path.display()
                )));
            }
            Ok(File::create(path)?)
        }
        _ => Err(SimulationError::ReportError(
            "Report output files must be CSVs at this time".to_string(),
        )),
    }
}

pub struct ReportWriter {
    options: ReportOptions,
    file_writers: HashMap<TypeId, Writer<File>>,
}

impl ReportWriter {
    #[must_use]
    pub fn new(options: ReportOptions) -> ReportWriter {
        ReportWriter {
            options,
            file_writers: HashMap::default(),
        }
    }

    /// Opens the file for report type `T` and returns its path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created, or if it exists and
    /// `overwrite` is off.
    pub fn add_report<T: Report>(&mut self, short_name: &str) -> Result<PathBuf, SimulationError> {
        let path = self
            .options
            .directory
            .join(format!("{}{short_name}.csv", self.options.file_prefix));
        let file = generate_validate_filepath(&path, self.options.overwrite)?;
        self.file_writers
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        debug!("writing {short_name} report to {}", path.display());
        Ok(path)
    }

    /// Writes a new row with columns following the fields of `report`.
    ///
    /// # Errors
    ///
    /// Returns an error if `T` was never added or the row cannot be written.
    pub fn send_report<T: Report>(&mut self, report: &T) -> Result<(), SimulationError> {
        let writer = self
            .file_writers
            .get_mut(&report.type_id())
            .ok_or_else(|| {
                SimulationError::ReportError("No writer found for the report type".to_string())
            })?;
        report.serialize(writer)
    }

    /// Flushes every report file.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn flush(&mut self) -> Result<(), SimulationError> {
        trace!("flushing {} report files", self.file_writers.len());
        for writer in self.file_writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}
