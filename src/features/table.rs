use crate::error::TableError;
use crate::features::definition::rows_from_definition;
use crate::features::row::{FeatureKind, FeatureRow};
use crate::features::saved;

use itertools::Itertools;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// File format of a features table, chosen by the file extension
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableFormat {
    /// YAML feature definition file, `.yaml` or `.yml`, read-only
    Definition,
    /// Flat CSV table, `.csv`
    Csv,
    /// JSON array of rows, `.json`
    Json,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Definition),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(TableError::UnsupportedFormat(extension)),
        }
    }
}

/// Ordered table of spectral features
///
/// Feature names are unique. Rows may be edited in place with [Features::rows_mut] and
/// [Features::get_mut], the schema of edited rows is checked only when the table is turned into
/// a model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Features {
    rows: Vec<FeatureRow>,
}

impl Features {
    pub fn new(rows: Vec<FeatureRow>) -> Result<Self, TableError> {
        if let Some(name) = rows.iter().map(|row| &row.name).duplicates().next() {
            return Err(TableError::DuplicateName(name.clone()));
        }
        Ok(Self { rows })
    }

    /// Parse a YAML feature definition
    ///
    /// The document is a mapping from group names to groups. Each group has a `kind`, one of
    /// `starlight`, `dust_continuum`, `line`, `dust_feature` and `attenuation`, and the parameters
    /// of that kind.
    ///
    /// A parameter is either a bare number, which gets default bounds, or a mapping with a
    /// `value` and either `bounds: [min, max]` or `fixed: true`. A bound is a number, `null` for
    /// an unbounded side, or an offset from the value: a string ending in `#` for an absolute
    /// offset or in `%` for a relative one.
    ///
    /// ```yaml
    /// PAH_11.3:
    ///   kind: dust_feature
    ///   wavelength: {value: 11.33, bounds: ["-0.05#", "0.05#"]}
    ///   fwhm: {value: 0.363, bounds: ["-20%", "20%"]}
    /// ```
    ///
    /// A group yields several rows when it has a `features` mapping of row names to parameters,
    /// or when its `wavelength` (lines and dust features) or `temperature` (continua) is a
    /// mapping of row names to values or a list of values. Rows created from a list are named
    /// `<group>_<index>`.
    ///
    /// Default bounds are `[0, inf)` for `power` and `tau`, ±0.5% for `wavelength` and ±10% for
    /// `fwhm`, temperatures are fixed. Attenuation uses the `S07` model and the `mixed` geometry
    /// unless given.
    pub fn from_definition_str(s: &str) -> Result<Self, TableError> {
        Self::new(rows_from_definition(s)?)
    }

    /// Read a table, the format is chosen by [TableFormat::from_path]
    pub fn read(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let format = TableFormat::from_path(path)?;
        let io_error = |source| TableError::Io {
            path: path.to_owned(),
            source,
        };
        let rows = match format {
            TableFormat::Definition => {
                let s = std::fs::read_to_string(path).map_err(io_error)?;
                rows_from_definition(&s)?
            }
            TableFormat::Csv => saved::read_csv(BufReader::new(File::open(path).map_err(io_error)?))?,
            TableFormat::Json => {
                saved::read_json(BufReader::new(File::open(path).map_err(io_error)?))?
            }
        };
        log::debug!("read {} features from {}", rows.len(), path.display());
        Self::new(rows)
    }

    /// Write a table as CSV or JSON, the format is chosen by [TableFormat::from_path]
    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), TableError> {
        let path = path.as_ref();
        let write: fn(&[FeatureRow], BufWriter<File>) -> Result<(), TableError> =
            match TableFormat::from_path(path)? {
                TableFormat::Csv => saved::write_csv,
                TableFormat::Json => saved::write_json,
                TableFormat::Definition => {
                    return Err(TableError::UnsupportedFormat(
                        "definition files are read-only, use csv or json".to_owned(),
                    ));
                }
            };
        let file = File::create(path).map_err(|source| TableError::Io {
            path: path.to_owned(),
            source,
        })?;
        write(&self.rows, BufWriter::new(file))?;
        log::debug!("wrote {} features to {}", self.rows.len(), path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureRow> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Mutable access to rows, renaming a row into an existing name is not checked
    pub fn rows_mut(&mut self) -> &mut [FeatureRow] {
        &mut self.rows
    }

    pub fn get(&self, name: &str) -> Option<&FeatureRow> {
        self.rows.iter().find(|row| row.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut FeatureRow> {
        self.rows.iter_mut().find(|row| row.name == name)
    }

    pub fn push(&mut self, row: FeatureRow) -> Result<(), TableError> {
        if self.get(&row.name).is_some() {
            return Err(TableError::DuplicateName(row.name));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|row| row.name.as_str())
    }

    /// Rows of the given kind, in table order
    pub fn of_kind(&self, kind: FeatureKind) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(move |row| row.kind == kind)
    }
}

impl<'a> IntoIterator for &'a Features {
    type Item = &'a FeatureRow;
    type IntoIter = std::slice::Iter<'a, FeatureRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
