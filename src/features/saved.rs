//! Readers and writers of saved feature tables
//!
//! CSV tables are flat: `name`, `group`, `kind`, `model` and `geometry` columns are followed by
//! `<param>`, `<param>_min`, `<param>_max` and `<param>_fixed` columns for every parameter. Empty
//! cells mark absent parameters and unbounded sides. JSON tables are arrays of [FeatureRow].

use crate::error::TableError;
use crate::features::param::BoundedParam;
use crate::features::row::{FeatureKind, FeatureRow};

use std::io::{Read, Write};

/// All parameter columns, in the order they are written
pub const PARAM_COLUMNS: [&str; 5] = ["temperature", "tau", "wavelength", "power", "fwhm"];

fn header() -> Vec<String> {
    let mut header: Vec<String> = ["name", "group", "kind", "model", "geometry"]
        .iter()
        .map(|&s| s.to_owned())
        .collect();
    for param in PARAM_COLUMNS {
        header.push(param.to_owned());
        header.push(format!("{param}_min"));
        header.push(format!("{param}_max"));
        header.push(format!("{param}_fixed"));
    }
    header
}

fn optional_cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub(super) fn write_csv<W: Write>(rows: &[FeatureRow], writer: W) -> Result<(), TableError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(header())?;
    for row in rows {
        let mut record = vec![
            row.name.clone(),
            row.group.clone(),
            row.kind.to_string(),
            row.model.clone().unwrap_or_default(),
            row.geometry.clone().unwrap_or_default(),
        ];
        for param in PARAM_COLUMNS {
            match row.param(param) {
                Some(p) => record.extend([
                    p.value.to_string(),
                    optional_cell(p.min),
                    optional_cell(p.max),
                    p.fixed.to_string(),
                ]),
                None => record.extend(std::iter::repeat_n(String::new(), 4)),
            }
        }
        writer.write_record(&record)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Column positions of a CSV table, parameters without a value column are skipped
struct Columns {
    name: usize,
    group: Option<usize>,
    kind: usize,
    model: Option<usize>,
    geometry: Option<usize>,
    params: Vec<ParamColumns>,
}

struct ParamColumns {
    param: &'static str,
    value: usize,
    min: Option<usize>,
    max: Option<usize>,
    fixed: Option<usize>,
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Result<Self, TableError> {
        let position = |column: &str| header.iter().position(|h| h.trim() == column);
        let required = |column: &str| {
            position(column)
                .ok_or_else(|| TableError::Schema(format!("column {column:?} is missing")))
        };
        let params = PARAM_COLUMNS
            .iter()
            .filter_map(|&param| {
                let value = position(param)?;
                Some(ParamColumns {
                    param,
                    value,
                    min: position(format!("{param}_min").as_str()),
                    max: position(format!("{param}_max").as_str()),
                    fixed: position(format!("{param}_fixed").as_str()),
                })
            })
            .collect();
        Ok(Self {
            name: required("name")?,
            group: position("group"),
            kind: required("kind")?,
            model: position("model"),
            geometry: position("geometry"),
            params,
        })
    }
}

fn cell<'a>(record: &'a csv::StringRecord, index: Option<usize>) -> Option<&'a str> {
    index
        .and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_number(line: usize, column: &str, s: &str) -> Result<f64, TableError> {
    s.parse()
        .map_err(|_| TableError::Schema(format!("line {line}, column {column}: {s:?} is not a number")))
}

fn parse_flag(line: usize, column: &str, s: &str) -> Result<bool, TableError> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(TableError::Schema(format!(
            "line {line}, column {column}: {s:?} is not a boolean"
        ))),
    }
}

/// Infinite bounds are the same as absent ones
fn parse_bound(line: usize, column: &str, s: Option<&str>) -> Result<Option<f64>, TableError> {
    match s {
        Some(s) => Ok(Some(parse_number(line, column, s)?).filter(|v| v.is_finite())),
        None => Ok(None),
    }
}

pub(super) fn read_csv<R: Read>(reader: R) -> Result<Vec<FeatureRow>, TableError> {
    let mut reader = csv::Reader::from_reader(reader);
    let columns = Columns::from_header(reader.headers()?)?;
    let mut rows = vec![];
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // header is line 1
        let line = i + 2;
        let name = cell(&record, Some(columns.name))
            .ok_or_else(|| TableError::Schema(format!("line {line}: empty name")))?;
        let group = cell(&record, columns.group).unwrap_or(name);
        let kind: FeatureKind = cell(&record, Some(columns.kind))
            .ok_or_else(|| TableError::Schema(format!("line {line}: empty kind")))?
            .parse()
            .map_err(|message: String| TableError::Schema(format!("line {line}: {message}")))?;
        let mut row = FeatureRow::new(name, group, kind);
        row.model = cell(&record, columns.model).map(str::to_owned);
        row.geometry = cell(&record, columns.geometry).map(str::to_owned);
        for p in &columns.params {
            let Some(value) = cell(&record, Some(p.value)) else {
                continue;
            };
            let param = BoundedParam {
                value: parse_number(line, p.param, value)?,
                min: parse_bound(line, p.param, cell(&record, p.min))?,
                max: parse_bound(line, p.param, cell(&record, p.max))?,
                fixed: match cell(&record, p.fixed) {
                    Some(flag) => parse_flag(line, p.param, flag)?,
                    None => false,
                },
            };
            if let Some(slot) = row.param_slot_mut(p.param) {
                *slot = Some(param);
            }
        }
        rows.push(row);
    }
    Ok(rows)
}

pub(super) fn write_json<W: Write>(rows: &[FeatureRow], writer: W) -> Result<(), TableError> {
    serde_json::to_writer_pretty(writer, rows)?;
    Ok(())
}

pub(super) fn read_json<R: Read>(reader: R) -> Result<Vec<FeatureRow>, TableError> {
    Ok(serde_json::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rows() -> Vec<FeatureRow> {
        let mut line = FeatureRow::new("[NeII]", "ionic_lines", FeatureKind::Line);
        line.wavelength = Some(BoundedParam::bounded(12.813, Some(12.75), Some(12.88)));
        line.power = Some(BoundedParam::bounded(0.0, Some(0.0), None));
        let mut silicate = FeatureRow::new("silicate", "silicate", FeatureKind::Attenuation);
        silicate.tau = Some(BoundedParam::fixed(0.1));
        silicate.model = Some("S07".to_owned());
        silicate.geometry = Some("screen".to_owned());
        vec![line, silicate]
    }

    #[test]
    fn csv_layout() {
        let mut buffer = vec![];
        write_csv(&sample_rows(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        let header = lines.next().unwrap();
        assert!(header.starts_with("name,group,kind,model,geometry,temperature,temperature_min"));
        assert!(header.ends_with("fwhm_max,fwhm_fixed"));
        let line = lines.next().unwrap();
        assert!(line.starts_with("[NeII],ionic_lines,line,,,,,,,,,,,12.813,12.75,12.88,false"));
    }

    #[test]
    fn csv_read_back() {
        let rows = sample_rows();
        let mut buffer = vec![];
        write_csv(&rows, &mut buffer).unwrap();
        assert_eq!(read_csv(buffer.as_slice()).unwrap(), rows);
    }

    #[test]
    fn csv_minimal_columns() {
        let text = "name,kind,temperature,tau,tau_min\nstars,starlight,5000,1e-3,-inf\n";
        let rows = read_csv(text.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].group, "stars");
        assert_eq!(rows[0].temperature, Some(BoundedParam::free(5000.0)));
        assert_eq!(rows[0].tau, Some(BoundedParam::free(1e-3)));
    }

    #[test]
    fn csv_errors() {
        for text in [
            "group,kind\nA,line\n",
            "name,kind\nA,bump\n",
            "name,kind,power\nA,line,big\n",
            "name,kind,power,power_fixed\nA,line,1.0,maybe\n",
        ] {
            assert!(
                matches!(read_csv(text.as_bytes()), Err(TableError::Schema(_))),
                "{text:?}"
            );
        }
    }

    #[test]
    fn json_read_back() {
        let rows = sample_rows();
        let mut buffer = vec![];
        write_json(&rows, &mut buffer).unwrap();
        assert_eq!(read_json(buffer.as_slice()).unwrap(), rows);
    }
}
