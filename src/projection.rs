//! Maps the columns a host asks for onto catalog positions.
//!
//! Each required column names an output column and the type the host
//! declared for it. Resolution looks the name up in the catalog, insists the
//! declared type kind equals the mapped one, and picks a coercion when the
//! declared modifier (length, precision/scale) differs from what the file
//! stores. Names that are not in the file resolve to `None` and read as null.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    catalog::{ColumnCatalog, MappedColumn},
    decimal::{self, NumericText, RawDecimal},
    error::{ScanError, ScanResult},
    types::{DeclaredType, DecimalSpec, TargetType, TypeModifier},
    value::Datum,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameMatch {
    #[default]
    Exact,
    CaseInsensitive,
}

impl NameMatch {
    pub fn matches(self, candidate: &str, wanted: &str) -> bool {
        match self {
            NameMatch::Exact => candidate == wanted,
            NameMatch::CaseInsensitive => candidate.eq_ignore_ascii_case(wanted),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequiredColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub declared: DeclaredType,
}

impl RequiredColumn {
    pub fn new(name: impl Into<String>, declared: impl Into<DeclaredType>) -> Self {
        Self {
            name: name.into(),
            declared: declared.into(),
        }
    }
}

impl FromStr for RequiredColumn {
    type Err = ScanError;

    /// Parses `name:type`, e.g. `amount:numeric(10,2)`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, declared) = value.split_once(':').ok_or_else(|| {
            ScanError::TypeName(format!("column '{value}' must be written as name:type"))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ScanError::TypeName(format!(
                "column '{value}' is missing a name"
            )));
        }
        Ok(Self {
            name: name.to_string(),
            declared: declared.parse()?,
        })
    }
}

/// A conversion applied to each value of a column after materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cast {
    /// Truncate to `max_length` characters; `Char` also pads with spaces.
    Length { kind: TargetType, max_length: u32 },
    Rescale(DecimalSpec),
}

impl fmt::Display for Cast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cast::Length { kind, max_length } => write!(f, "{kind}({max_length})"),
            Cast::Rescale(spec) => write!(f, "numeric{spec}"),
        }
    }
}

impl Cast {
    pub fn apply(&self, column: &str, datum: Datum) -> ScanResult<Datum> {
        match (self, datum) {
            (Cast::Length { kind, max_length }, Datum::Text(bytes)) => {
                Ok(Datum::Text(fit_length(bytes, *kind, *max_length as usize)))
            }
            (Cast::Rescale(spec), Datum::Numeric(numeric)) => rescale(column, &numeric, *spec),
            (cast, other) => Err(ScanError::Cast {
                column: column.to_string(),
                reason: format!("{cast} does not apply to value '{other}'"),
            }),
        }
    }
}

/// One output column of a scan: the catalog position it reads and the cast
/// its values go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputColumn {
    pub position: usize,
    pub cast: Option<Cast>,
}

impl OutputColumn {
    pub fn plain(position: usize) -> Self {
        Self {
            position,
            cast: None,
        }
    }
}

fn fit_length(bytes: Vec<u8>, kind: TargetType, max_length: usize) -> Vec<u8> {
    match String::from_utf8(bytes) {
        Ok(text) => {
            let mut fitted: String = text.chars().take(max_length).collect();
            if kind == TargetType::Char {
                let missing = max_length.saturating_sub(fitted.chars().count());
                fitted.extend(std::iter::repeat_n(' ', missing));
            }
            fitted.into_bytes()
        }
        Err(err) => {
            let mut bytes = err.into_bytes();
            bytes.truncate(max_length);
            if kind == TargetType::Char {
                bytes.resize(max_length, b' ');
            }
            bytes
        }
    }
}

fn rescale(column: &str, numeric: &NumericText, spec: DecimalSpec) -> ScanResult<Datum> {
    let overflow = || ScanError::Cast {
        column: column.to_string(),
        reason: format!(
            "numeric field overflow: '{}' does not fit numeric{spec}",
            numeric.text
        ),
    };
    let (value, scale) = numeric.to_scaled().ok_or_else(|| ScanError::Cast {
        column: column.to_string(),
        reason: format!("'{}' is not a decimal literal", numeric.text),
    })?;
    let rescaled = decimal::rescale(value, scale, spec.scale).ok_or_else(overflow)?;
    if decimal::digit_count(rescaled) > spec.precision {
        return Err(overflow());
    }
    let rendered = decimal::render(RawDecimal::Wide(rescaled), spec.precision, spec.scale, 0);
    Ok(Datum::Numeric(NumericText {
        typmod: Some(spec),
        ..rendered
    }))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoercionPath {
    BinaryCompatible,
    Function(Cast),
    None,
}

/// Finds how a stored column reaches a declared type of the same kind.
pub trait CoercionLookup {
    fn lookup(&self, column: &MappedColumn, declared: &DeclaredType) -> CoercionPath;
}

/// Length coercions for text types and rescaling for numerics.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinCoercions;

impl CoercionLookup for BuiltinCoercions {
    fn lookup(&self, column: &MappedColumn, declared: &DeclaredType) -> CoercionPath {
        match declared.modifier {
            None => CoercionPath::BinaryCompatible,
            Some(TypeModifier::Length(max_length)) if column.target.is_text_family() => {
                CoercionPath::Function(Cast::Length {
                    kind: declared.kind,
                    max_length,
                })
            }
            Some(TypeModifier::Numeric(spec)) if column.target == TargetType::Numeric => {
                CoercionPath::Function(Cast::Rescale(spec))
            }
            Some(_) => CoercionPath::None,
        }
    }
}

fn natural_modifier(column: &MappedColumn) -> Option<TypeModifier> {
    column.natural_type().modifier
}

fn storage_matches(column: &MappedColumn, declared: &DeclaredType) -> bool {
    match (declared.modifier, natural_modifier(column)) {
        (None, _) => true,
        (Some(wanted), Some(stored)) if wanted == stored => true,
        (Some(TypeModifier::Length(wanted)), Some(TypeModifier::Length(stored))) => {
            column.target == TargetType::Varchar && wanted >= stored
        }
        _ => false,
    }
}

/// Resolves `required` against the catalog, one slot per required column.
/// An empty `required` list selects every catalog column.
pub fn resolve(
    required: &[RequiredColumn],
    catalog: &ColumnCatalog,
    mode: NameMatch,
    coercions: &dyn CoercionLookup,
) -> ScanResult<Vec<Option<OutputColumn>>> {
    if required.is_empty() {
        return Ok((0..catalog.len())
            .map(|position| Some(OutputColumn::plain(position)))
            .collect());
    }
    let mut projection = Vec::with_capacity(required.len());
    for wanted in required {
        let Some(position) = catalog.position(&wanted.name, mode) else {
            projection.push(None);
            continue;
        };
        let Some(column) = catalog.get(position) else {
            projection.push(None);
            continue;
        };
        if wanted.declared.kind != column.target {
            return Err(ScanError::TypeMismatch {
                column: wanted.name.clone(),
                declared: wanted.declared.kind,
                mapped: column.target,
            });
        }
        let cast = if storage_matches(column, &wanted.declared) {
            None
        } else {
            match coercions.lookup(column, &wanted.declared) {
                CoercionPath::BinaryCompatible => None,
                CoercionPath::Function(cast) => Some(cast),
                CoercionPath::None => {
                    let from = match natural_modifier(column) {
                        Some(modifier) => format!("{}{modifier}", column.target),
                        None => column.target.to_string(),
                    };
                    return Err(ScanError::NoCoercionPath {
                        column: wanted.name.clone(),
                        from,
                        to: wanted.declared.to_string(),
                    });
                }
            }
        };
        projection.push(Some(OutputColumn { position, cast }));
    }
    Ok(projection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::SourceColumnInfo, types::SourceKind};

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::build(&[
            SourceColumnInfo::new(0, "id", SourceKind::Int),
            SourceColumnInfo::new(1, "name", SourceKind::String),
            SourceColumnInfo::new(2, "price", SourceKind::Decimal).with_decimal(10, 2),
            SourceColumnInfo::new(3, "code", SourceKind::Varchar).with_max_length(8),
            SourceColumnInfo::new(4, "Name", SourceKind::String),
        ])
    }

    fn required(spec: &str) -> RequiredColumn {
        spec.parse().unwrap()
    }

    fn positions(projection: &[Option<OutputColumn>]) -> Vec<Option<usize>> {
        projection
            .iter()
            .map(|slot| slot.map(|output| output.position))
            .collect()
    }

    #[test]
    fn empty_request_is_identity() {
        let catalog = catalog();
        let projection = resolve(&[], &catalog, NameMatch::Exact, &BuiltinCoercions).unwrap();
        assert_eq!(
            positions(&projection),
            vec![Some(0), Some(1), Some(2), Some(3), Some(4)]
        );
        assert!(projection.iter().flatten().all(|output| output.cast.is_none()));
    }

    #[test]
    fn unknown_names_resolve_to_none() {
        let catalog = catalog();
        let projection = resolve(
            &[required("missing:int4"), required("id:int4")],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap();
        assert_eq!(positions(&projection), vec![None, Some(0)]);
    }

    #[test]
    fn type_kind_mismatch_is_fatal() {
        let catalog = catalog();
        let err = resolve(
            &[required("id:text")],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::TypeMismatch { .. }));
    }

    #[test]
    fn first_match_wins_under_case_insensitive_mode() {
        let catalog = catalog();
        let projection = resolve(
            &[required("NAME:text")],
            &catalog,
            NameMatch::CaseInsensitive,
            &BuiltinCoercions,
        )
        .unwrap();
        assert_eq!(positions(&projection), vec![Some(1)]);

        let exact = resolve(
            &[required("Name:text"), required("NAME:text")],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap();
        assert_eq!(positions(&exact), vec![Some(4), None]);
    }

    #[test]
    fn modifier_changes_attach_casts() {
        let catalog = catalog();
        let projection = resolve(
            &[
                required("price:numeric(12,1)"),
                required("code:varchar(4)"),
                required("name:text"),
            ],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap();
        let casts: Vec<_> = projection.iter().flatten().map(|output| output.cast).collect();
        assert_eq!(
            casts,
            vec![
                Some(Cast::Rescale(DecimalSpec { precision: 12, scale: 1 })),
                Some(Cast::Length {
                    kind: TargetType::Varchar,
                    max_length: 4
                }),
                None,
            ]
        );
    }

    #[test]
    fn same_column_keeps_a_cast_per_output_position() {
        let catalog = catalog();
        let projection = resolve(
            &[required("code:varchar(3)"), required("code:varchar(5)")],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap();
        assert_eq!(positions(&projection), vec![Some(3), Some(3)]);
        let casts: Vec<_> = projection.iter().flatten().map(|output| output.cast).collect();
        assert_eq!(
            casts,
            vec![
                Some(Cast::Length {
                    kind: TargetType::Varchar,
                    max_length: 3
                }),
                Some(Cast::Length {
                    kind: TargetType::Varchar,
                    max_length: 5
                }),
            ]
        );
    }

    #[test]
    fn matching_or_wider_modifiers_need_no_cast() {
        let catalog = catalog();
        let projection = resolve(
            &[required("price:numeric(10,2)"), required("code:varchar(20)")],
            &catalog,
            NameMatch::Exact,
            &BuiltinCoercions,
        )
        .unwrap();
        assert!(projection.iter().flatten().all(|output| output.cast.is_none()));
    }

    #[test]
    fn missing_coercion_path_is_fatal() {
        struct Nothing;
        impl CoercionLookup for Nothing {
            fn lookup(&self, _: &MappedColumn, _: &DeclaredType) -> CoercionPath {
                CoercionPath::None
            }
        }
        let catalog = catalog();
        let err = resolve(
            &[required("price:numeric(5,0)")],
            &catalog,
            NameMatch::Exact,
            &Nothing,
        )
        .unwrap_err();
        assert!(matches!(err, ScanError::NoCoercionPath { .. }));
    }

    #[test]
    fn length_cast_truncates_and_pads() {
        let varchar = Cast::Length {
            kind: TargetType::Varchar,
            max_length: 3,
        };
        let char = Cast::Length {
            kind: TargetType::Char,
            max_length: 4,
        };
        assert_eq!(
            varchar.apply("c", Datum::Text(b"abcdef".to_vec())).unwrap(),
            Datum::Text(b"abc".to_vec())
        );
        assert_eq!(
            char.apply("c", Datum::Text(b"ab".to_vec())).unwrap(),
            Datum::Text(b"ab  ".to_vec())
        );
        assert_eq!(
            varchar.apply("c", Datum::Text("héllo".as_bytes().to_vec())).unwrap(),
            Datum::Text("hél".as_bytes().to_vec())
        );
    }

    #[test]
    fn rescale_rounds_half_away_from_zero() {
        let cast = Cast::Rescale(DecimalSpec { precision: 6, scale: 1 });
        let input = Datum::Numeric(NumericText::untyped("-12.25"));
        let Datum::Numeric(out) = cast.apply("p", input).unwrap() else {
            panic!("expected numeric");
        };
        assert_eq!(out.text, "-12.3");
        assert_eq!(out.typmod, Some(DecimalSpec { precision: 6, scale: 1 }));

        let padded = cast
            .apply("p", Datum::Numeric(NumericText::untyped("4")))
            .unwrap();
        assert_eq!(padded.as_display(), "4.0");
    }

    #[test]
    fn rescale_keeps_every_digit_of_wide_values() {
        let cast = Cast::Rescale(DecimalSpec { precision: 38, scale: 2 });
        let input = Datum::Numeric(NumericText::untyped("1234567890123456789012345678.5678"));
        let Datum::Numeric(out) = cast.apply("big", input).unwrap() else {
            panic!("expected numeric");
        };
        assert_eq!(out.text, "1234567890123456789012345678.57");
        assert_eq!(out.typmod, Some(DecimalSpec { precision: 38, scale: 2 }));

        let whole = Cast::Rescale(DecimalSpec { precision: 5, scale: 0 });
        let Datum::Numeric(rounded) = whole
            .apply("p", Datum::Numeric(NumericText::untyped("-12.5")))
            .unwrap()
        else {
            panic!("expected numeric");
        };
        assert_eq!(rounded.text, "-13");
        assert_eq!(rounded.typmod, Some(DecimalSpec { precision: 5, scale: 0 }));
    }

    #[test]
    fn rescale_overflow_is_a_cast_error() {
        let cast = Cast::Rescale(DecimalSpec { precision: 3, scale: 1 });
        let err = cast
            .apply("p", Datum::Numeric(NumericText::untyped("123.4")))
            .unwrap_err();
        assert!(matches!(err, ScanError::Cast { .. }));
    }

    #[test]
    fn required_column_parses_name_and_type() {
        let column = required("amount:numeric(10,2)");
        assert_eq!(column.name, "amount");
        assert_eq!(column.declared, DeclaredType::numeric(10, 2).unwrap());
        assert!("amount".parse::<RequiredColumn>().is_err());
        assert!(":int4".parse::<RequiredColumn>().is_err());
    }
}
