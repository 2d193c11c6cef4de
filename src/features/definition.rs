//! Reader of YAML feature definition files
//!
//! A definition file is a mapping from group names to groups. Every group has a `kind` and a set of
//! parameters, see [crate::Features::from_definition_str] for the full format.

use crate::error::TableError;
use crate::features::param::BoundedParam;
use crate::features::row::{FeatureKind, FeatureRow};

use serde_yaml::{Mapping, Value};

/// Attenuation model used when the definition doesn't name one
pub const DEFAULT_ATTENUATION_MODEL: &str = "S07";
/// Dust-star geometry used when the definition doesn't name one
pub const DEFAULT_GEOMETRY: &str = "mixed";

/// Bounds applied to a parameter given as a bare value
#[derive(Clone, Copy, Debug)]
enum DefaultBounds {
    Fixed,
    Absolute(Option<f64>, Option<f64>),
    Percent(f64),
}

fn default_bounds(param: &str) -> DefaultBounds {
    match param {
        "tau" | "power" => DefaultBounds::Absolute(Some(0.0), None),
        "wavelength" => DefaultBounds::Percent(0.5),
        "fwhm" => DefaultBounds::Percent(10.0),
        _ => DefaultBounds::Fixed,
    }
}

fn with_default_bounds(param: &str, value: f64) -> BoundedParam {
    match default_bounds(param) {
        DefaultBounds::Fixed => BoundedParam::fixed(value),
        DefaultBounds::Absolute(min, max) => BoundedParam::bounded(value, min, max),
        DefaultBounds::Percent(percent) => {
            let offset = value.abs() * percent / 100.0;
            BoundedParam::bounded(value, Some(value - offset), Some(value + offset))
        }
    }
}

/// Parameter which is spread over several rows when given as a mapping or a list
fn multiplexed_param(kind: FeatureKind) -> Option<&'static str> {
    match kind {
        FeatureKind::Line | FeatureKind::DustFeature => Some("wavelength"),
        FeatureKind::Starlight | FeatureKind::DustContinuum => Some("temperature"),
        FeatureKind::Attenuation => None,
    }
}

fn required_params(kind: FeatureKind) -> &'static [&'static str] {
    match kind {
        FeatureKind::Starlight | FeatureKind::DustContinuum => &["temperature"],
        FeatureKind::Line => &["wavelength"],
        FeatureKind::DustFeature => &["wavelength", "fwhm"],
        FeatureKind::Attenuation => &[],
    }
}

fn amplitude_param(kind: FeatureKind) -> &'static str {
    match kind {
        FeatureKind::Line | FeatureKind::DustFeature => "power",
        FeatureKind::Starlight | FeatureKind::DustContinuum | FeatureKind::Attenuation => "tau",
    }
}

pub(super) fn rows_from_definition(s: &str) -> Result<Vec<FeatureRow>, TableError> {
    let doc: Value = serde_yaml::from_str(s)?;
    let groups = match doc {
        Value::Null => return Ok(vec![]),
        Value::Mapping(groups) => groups,
        _ => {
            return Err(TableError::definition(
                "",
                "top level of a definition file must be a mapping of groups",
            ));
        }
    };
    let mut rows = vec![];
    for (group, body) in &groups {
        let group = key_as_str("", group)?;
        rows.extend(parse_group(group, body)?);
    }
    Ok(rows)
}

fn key_as_str<'a>(group: &str, key: &'a Value) -> Result<&'a str, TableError> {
    key.as_str()
        .ok_or_else(|| TableError::definition(group, format!("key {key:?} is not a string")))
}

fn parse_group(group: &str, body: &Value) -> Result<Vec<FeatureRow>, TableError> {
    let map = body
        .as_mapping()
        .ok_or_else(|| TableError::definition(group, "group must be a mapping"))?;
    let kind: FeatureKind = map
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| TableError::definition(group, "kind is missing or is not a string"))?
        .parse()
        .map_err(|message: String| TableError::definition(group, message))?;

    for key in map.keys() {
        let key = key_as_str(group, key)?;
        let known = key == "kind"
            || key == "features"
            || kind.param_names().contains(&key)
            || (kind == FeatureKind::Attenuation && (key == "model" || key == "geometry"));
        if !known {
            return Err(TableError::definition(
                group,
                format!("unexpected key {key:?} for {kind} features"),
            ));
        }
    }

    let mut template = FeatureRow::new(group, group, kind);
    if kind == FeatureKind::Attenuation {
        template.model = Some(string_attribute(group, map, "model", DEFAULT_ATTENUATION_MODEL)?);
        template.geometry = Some(string_attribute(group, map, "geometry", DEFAULT_GEOMETRY)?);
    }

    let rows = if let Some(features) = map.get("features") {
        let features = features
            .as_mapping()
            .ok_or_else(|| TableError::definition(group, "features must be a mapping"))?;
        apply_params(&mut template, group, map, None)?;
        features
            .iter()
            .map(|(name, spec)| {
                let name = key_as_str(group, name)?;
                let spec = spec.as_mapping().ok_or_else(|| {
                    TableError::definition(group, format!("feature {name:?} must be a mapping"))
                })?;
                for key in spec.keys() {
                    let key = key_as_str(group, key)?;
                    if !kind.param_names().contains(&key) {
                        return Err(TableError::definition(
                            group,
                            format!("unexpected key {key:?} for feature {name:?}"),
                        ));
                    }
                }
                let mut row = template.clone();
                row.name = name.to_owned();
                apply_params(&mut row, group, spec, None)?;
                Ok(row)
            })
            .collect::<Result<Vec<_>, TableError>>()?
    } else {
        let multiplexed = multiplexed_param(kind).and_then(|p| map.get(p).map(|v| (p, v)));
        match multiplexed {
            Some((param, Value::Mapping(values))) if !values.contains_key("value") => {
                apply_params(&mut template, group, map, Some(param))?;
                values
                    .iter()
                    .map(|(name, spec)| {
                        let mut row = template.clone();
                        row.name = key_as_str(group, name)?.to_owned();
                        set_param(&mut row, group, param, spec)?;
                        Ok(row)
                    })
                    .collect::<Result<Vec<_>, TableError>>()?
            }
            Some((param, Value::Sequence(values))) => {
                apply_params(&mut template, group, map, Some(param))?;
                values
                    .iter()
                    .enumerate()
                    .map(|(i, spec)| {
                        let mut row = template.clone();
                        row.name = format!("{group}_{i}");
                        set_param(&mut row, group, param, spec)?;
                        Ok(row)
                    })
                    .collect::<Result<Vec<_>, TableError>>()?
            }
            _ => {
                apply_params(&mut template, group, map, None)?;
                vec![template]
            }
        }
    };

    rows.into_iter().map(|row| finish_row(group, row)).collect()
}

fn string_attribute(
    group: &str,
    map: &Mapping,
    key: &str,
    default: &str,
) -> Result<String, TableError> {
    match map.get(key) {
        None => Ok(default.to_owned()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(other) => Err(TableError::definition(
            group,
            format!("{key} must be a string, got {other:?}"),
        )),
    }
}

/// Set every parameter found in `map`, except `skip`
fn apply_params(
    row: &mut FeatureRow,
    group: &str,
    map: &Mapping,
    skip: Option<&str>,
) -> Result<(), TableError> {
    for &param in row.kind.param_names() {
        if Some(param) == skip {
            continue;
        }
        if let Some(spec) = map.get(param) {
            set_param(row, group, param, spec)?;
        }
    }
    Ok(())
}

fn set_param(
    row: &mut FeatureRow,
    group: &str,
    param: &str,
    spec: &Value,
) -> Result<(), TableError> {
    let value = parse_param(group, param, spec)?;
    match row.param_slot_mut(param) {
        Some(slot) => {
            *slot = Some(value);
            Ok(())
        }
        None => Err(TableError::definition(
            group,
            format!("unknown parameter {param:?}"),
        )),
    }
}

fn finish_row(group: &str, mut row: FeatureRow) -> Result<FeatureRow, TableError> {
    for &param in required_params(row.kind) {
        if row.param(param).is_none() {
            return Err(TableError::definition(
                group,
                format!("feature {:?} has no {param}", row.name),
            ));
        }
    }
    let amplitude = amplitude_param(row.kind);
    if let Some(slot) = row.param_slot_mut(amplitude) {
        slot.get_or_insert(with_default_bounds(amplitude, 0.0));
    }
    Ok(row)
}

fn number(group: &str, param: &str, value: &Value) -> Result<f64, TableError> {
    value.as_f64().ok_or_else(|| {
        TableError::definition(group, format!("{param} value {value:?} is not a number"))
    })
}

/// Parse a bare number, `{value, bounds}` or `{value, fixed}` mapping
fn parse_param(group: &str, param: &str, spec: &Value) -> Result<BoundedParam, TableError> {
    match spec {
        Value::Number(_) => Ok(with_default_bounds(param, number(group, param, spec)?)),
        Value::Mapping(map) => {
            for key in map.keys() {
                let key = key_as_str(group, key)?;
                if !matches!(key, "value" | "bounds" | "fixed") {
                    return Err(TableError::definition(
                        group,
                        format!("unexpected key {key:?} in {param} specification"),
                    ));
                }
            }
            let value = map
                .get("value")
                .ok_or_else(|| TableError::definition(group, format!("{param} has no value")))?;
            let value = number(group, param, value)?;
            let fixed = match map.get("fixed") {
                None => false,
                Some(Value::Bool(fixed)) => *fixed,
                Some(other) => {
                    return Err(TableError::definition(
                        group,
                        format!("{param} fixed flag must be a boolean, got {other:?}"),
                    ));
                }
            };
            if fixed {
                return Ok(BoundedParam::fixed(value));
            }
            match map.get("bounds") {
                None => Ok(with_default_bounds(param, value)),
                Some(Value::Sequence(bounds)) if bounds.len() == 2 => Ok(BoundedParam::bounded(
                    value,
                    parse_bound(value, &bounds[0], -1.0)?,
                    parse_bound(value, &bounds[1], 1.0)?,
                )),
                Some(_) => Err(TableError::definition(
                    group,
                    format!("{param} bounds must be a list of two elements"),
                )),
            }
        }
        _ => Err(TableError::definition(
            group,
            format!("cannot interpret {param} specification {spec:?}"),
        )),
    }
}

/// `sign` is -1 for the lower bound and +1 for the upper one, infinite bounds are absent
fn parse_bound(value: f64, bound: &Value, sign: f64) -> Result<Option<f64>, TableError> {
    match bound {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_f64()
            .map(|v| Some(v).filter(|v| v.is_finite()))
            .ok_or_else(|| TableError::InvalidBound(n.to_string())),
        Value::String(s) => parse_offset(value, s, sign).map(Some),
        other => Err(TableError::InvalidBound(format!("{other:?}"))),
    }
}

fn parse_offset(value: f64, s: &str, sign: f64) -> Result<f64, TableError> {
    let trimmed = s.trim();
    let (number, percent) = if let Some(number) = trimmed.strip_suffix('%') {
        (number, true)
    } else if let Some(number) = trimmed.strip_suffix('#') {
        (number, false)
    } else {
        return Err(TableError::InvalidBound(s.to_owned()));
    };
    let offset: f64 = number
        .trim()
        .parse()
        .map_err(|_| TableError::InvalidBound(s.to_owned()))?;
    let offset = if percent {
        value.abs() * offset.abs() / 100.0
    } else {
        offset.abs()
    };
    Ok(value + sign * offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn parse(s: &str) -> Vec<FeatureRow> {
        rows_from_definition(s).unwrap()
    }

    #[test]
    fn single_feature_group() {
        let rows = parse("PAH_6.2:\n  kind: dust_feature\n  wavelength: 6.22\n  fwhm: 0.1866\n");
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.name, "PAH_6.2");
        assert_eq!(row.group, "PAH_6.2");
        assert_eq!(row.kind, FeatureKind::DustFeature);
        let wavelength = row.wavelength.unwrap();
        assert_eq!(wavelength.value, 6.22);
        assert_relative_eq!(wavelength.lower(), 6.22 * 0.995);
        assert_relative_eq!(wavelength.upper(), 6.22 * 1.005);
        let fwhm = row.fwhm.unwrap();
        assert_relative_eq!(fwhm.lower(), 0.1866 * 0.9);
        assert_eq!(row.power, Some(BoundedParam::bounded(0.0, Some(0.0), None)));
    }

    #[test]
    fn wavelength_mapping_spreads_rows() {
        let rows = parse(
            "H2:\n  kind: line\n  wavelength:\n    H2_S(1): 17.0346\n    H2_S(2): 12.2785\n",
        );
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, ["H2_S(1)", "H2_S(2)"]);
        assert!(rows.iter().all(|row| row.group == "H2"));
        assert!(rows.iter().all(|row| row.fwhm.is_none()));
        assert_eq!(rows[1].wavelength.unwrap().value, 12.2785);
    }

    #[test]
    fn temperature_list_spreads_rows() {
        let rows = parse("dust_cont:\n  kind: dust_continuum\n  temperature: [300, 200]\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "dust_cont_0");
        assert_eq!(rows[1].name, "dust_cont_1");
        assert_eq!(rows[1].temperature, Some(BoundedParam::fixed(200.0)));
        assert_eq!(rows[1].tau, Some(BoundedParam::bounded(0.0, Some(0.0), None)));
    }

    #[test]
    fn features_mapping_inherits_group_params() {
        let rows = parse(
            "cmp:\n  kind: dust_feature\n  fwhm: 0.5\n  features:\n    a:\n      wavelength: 7.42\n    b:\n      wavelength: 7.6\n      fwhm: 0.33\n",
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].fwhm.unwrap().value, 0.5);
        assert_eq!(rows[1].fwhm.unwrap().value, 0.33);
        assert_eq!(rows[0].group, "cmp");
    }

    #[test]
    fn explicit_bounds_and_offsets() {
        let rows = parse(
            "f:\n  kind: dust_feature\n  wavelength: {value: 11.33, bounds: [\"-0.1#\", \"0.2#\"]}\n  fwhm: {value: 0.4, bounds: [\"-20%\", null]}\n  power: {value: 1.0, fixed: true}\n",
        );
        let row = &rows[0];
        let wavelength = row.wavelength.unwrap();
        assert_relative_eq!(wavelength.lower(), 11.23, epsilon = 1e-12);
        assert_relative_eq!(wavelength.upper(), 11.53, epsilon = 1e-12);
        let fwhm = row.fwhm.unwrap();
        assert_relative_eq!(fwhm.lower(), 0.32, epsilon = 1e-12);
        assert_eq!(fwhm.max, None);
        assert_eq!(row.power, Some(BoundedParam::fixed(1.0)));
    }

    #[test]
    fn infinite_bounds_are_absent() {
        let rows = parse(
            "f:\n  kind: dust_feature\n  wavelength: {value: 6.2, bounds: [5.0, .inf]}\n  fwhm: {value: 0.2, bounds: [-.inf, 1.0]}\n",
        );
        let row = &rows[0];
        assert_eq!(
            row.wavelength,
            Some(BoundedParam::bounded(6.2, Some(5.0), None))
        );
        assert_eq!(row.fwhm, Some(BoundedParam::bounded(0.2, None, Some(1.0))));
    }

    #[test]
    fn attenuation_defaults() {
        let rows = parse("silicate:\n  kind: attenuation\n");
        assert_eq!(rows[0].model.as_deref(), Some(DEFAULT_ATTENUATION_MODEL));
        assert_eq!(rows[0].geometry.as_deref(), Some(DEFAULT_GEOMETRY));
        assert_eq!(rows[0].tau.unwrap().value, 0.0);
    }

    #[test]
    fn empty_document() {
        assert!(parse("").is_empty());
    }

    #[test]
    fn errors() {
        let cases = [
            "g: 1.0\n",
            "g:\n  wavelength: 1.0\n",
            "g:\n  kind: bump\n",
            "g:\n  kind: line\n",
            "g:\n  kind: dust_feature\n  wavelength: 6.2\n",
            "g:\n  kind: line\n  wavelength: 6.2\n  temperature: 100\n",
            "g:\n  kind: line\n  wavelength: 6.2\n  model: S07\n",
            "g:\n  kind: line\n  wavelength: {value: 6.2, bounds: [1.0]}\n",
            "g:\n  kind: line\n  wavelength: {bounds: [1.0, 2.0]}\n",
            "g:\n  kind: line\n  wavelength: six\n",
            "- a\n- b\n",
        ];
        for case in cases {
            assert!(
                matches!(
                    rows_from_definition(case),
                    Err(TableError::InvalidDefinition { .. })
                ),
                "{case:?} must be rejected"
            );
        }
        assert!(matches!(
            rows_from_definition(
                "g:\n  kind: line\n  wavelength: {value: 6.2, bounds: [\"1\", 7.0]}\n"
            ),
            Err(TableError::InvalidBound(_))
        ));
        assert!(matches!(
            rows_from_definition("g: [unclosed\n"),
            Err(TableError::Yaml(_))
        ));
    }
}
