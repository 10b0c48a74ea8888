//! Classification and resolution of CRS definitions.
//!
//! Input is sniffed into one of a closed set of [`CrsInput`] variants, each resolved by its
//! own PROJ entry point, and every variant ends in the same canonical definition text.

use crate::context::ThreadContext;
use crate::crs::CrsKind;
use crate::datadir::DataDir;
use crate::error::ProjError;
use crate::pj::Pj;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

/// Leading keywords of every WKT1 and WKT2 CRS object.
const WKT_KEYWORDS: &[&str] = &[
    "GEOGCS",
    "GEOCCS",
    "PROJCS",
    "VERT_CS",
    "VERTCS",
    "LOCAL_CS",
    "COMPD_CS",
    "FITTED_CS",
    "GEODCRS",
    "GEODETICCRS",
    "GEOGCRS",
    "GEOGRAPHICCRS",
    "PROJCRS",
    "PROJECTEDCRS",
    "BASEPROJCRS",
    "DERIVEDPROJCRS",
    "VERTCRS",
    "VERTICALCRS",
    "ENGCRS",
    "ENGINEERINGCRS",
    "PARAMETRICCRS",
    "TIMECRS",
    "COMPOUNDCRS",
    "BOUNDCRS",
];

/// Whether `text` starts like a WKT CRS: a known keyword followed by `[` or `(`.
///
/// Only the opening is inspected, so malformed WKT still answers `true` and anything else
/// answers `false`; this never fails.
///
/// ```
/// use geoproj::looks_like_wkt;
///
/// assert!(looks_like_wkt("GEOGCS[\"WGS 84\",DATUM[...]]"));
/// assert!(looks_like_wkt("  projcrs [ broken"));
/// assert!(!looks_like_wkt("+proj=longlat +datum=WGS84"));
/// assert!(!looks_like_wkt("EPSG:4326"));
/// ```
pub fn looks_like_wkt(text: &str) -> bool {
    let text = text.trim_start();
    let keyword_len = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    let (keyword, rest) = text.split_at(keyword_len);
    let opens_bracket = matches!(rest.trim_start().chars().next(), Some('[') | Some('('));
    opens_bracket
        && WKT_KEYWORDS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(keyword))
}

/// A CRS description in one of the supported forms.
#[derive(Debug, Clone, PartialEq)]
pub enum CrsInput {
    /// WKT1 or WKT2 text.
    Wkt(String),
    /// PROJ parameters such as `+proj=utm +zone=33 +datum=WGS84`.
    ProjString(String),
    /// An `authority:code` pair such as `EPSG:4326`.
    Authority { authority: String, code: String },
    /// PROJ parameter names mapped to values; `"true"` marks a bare flag.
    Parameters(Vec<(String, String)>),
    /// PROJJSON text.
    Json(String),
    /// CRS names, URNs and any other text PROJ may resolve.
    Other(String),
}

impl CrsInput {
    /// Classifies free-form text by its shape.
    pub fn sniff(text: &str) -> CrsInput {
        let trimmed = text.trim();
        if looks_like_wkt(trimmed) {
            return CrsInput::Wkt(trimmed.to_string());
        }
        if trimmed.starts_with('{') {
            return CrsInput::Json(trimmed.to_string());
        }
        if trimmed.starts_with('+')
            || trimmed
                .split_whitespace()
                .any(|token| token.starts_with("proj=") || token.starts_with("init="))
        {
            return CrsInput::ProjString(trimmed.to_string());
        }
        if !trimmed.is_empty() && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return CrsInput::Authority {
                authority: "EPSG".to_string(),
                code: trimmed.to_string(),
            };
        }
        if let Some((authority, code)) = trimmed.split_once(':') {
            let is_token = |s: &str| {
                !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
            };
            if is_token(authority) && is_token(code) && !authority.eq_ignore_ascii_case("urn") {
                return CrsInput::Authority {
                    authority: authority.to_ascii_uppercase(),
                    code: code.to_string(),
                };
            }
        }
        CrsInput::Other(trimmed.to_string())
    }

    pub fn from_params<I, K, V>(params: I) -> CrsInput
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        CrsInput::Parameters(
            params
                .into_iter()
                .map(|(key, value)| (key.into(), value.to_string()))
                .collect(),
        )
    }
}

impl fmt::Display for CrsInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CrsInput::Wkt(text)
            | CrsInput::ProjString(text)
            | CrsInput::Json(text)
            | CrsInput::Other(text) => f.write_str(text),
            CrsInput::Authority { authority, code } => write!(f, "{authority}:{code}"),
            CrsInput::Parameters(params) => f.write_str(&params_to_proj_string(params)),
        }
    }
}

impl From<&str> for CrsInput {
    fn from(text: &str) -> Self {
        CrsInput::sniff(text)
    }
}

impl From<String> for CrsInput {
    fn from(text: String) -> Self {
        CrsInput::sniff(&text)
    }
}

/// An EPSG code.
impl From<u32> for CrsInput {
    fn from(code: u32) -> Self {
        CrsInput::Authority {
            authority: "EPSG".to_string(),
            code: code.to_string(),
        }
    }
}

impl From<(&str, &str)> for CrsInput {
    fn from((authority, code): (&str, &str)) -> Self {
        CrsInput::Authority {
            authority: authority.to_string(),
            code: code.to_string(),
        }
    }
}

impl<K: Into<String>, V: ToString> From<BTreeMap<K, V>> for CrsInput {
    fn from(params: BTreeMap<K, V>) -> Self {
        CrsInput::from_params(params)
    }
}

impl<K: Into<String> + Ord, V: ToString> From<HashMap<K, V>> for CrsInput {
    fn from(params: HashMap<K, V>) -> Self {
        // sorted so the resulting PROJ string does not depend on hash order
        CrsInput::from_params(params.into_iter().collect::<BTreeMap<_, _>>())
    }
}

/// How database lookups that match several CRSs are settled.
#[derive(Debug, Clone, PartialEq)]
pub struct ParserOptions {
    /// Authorities in order of preference when a name matches several CRSs.
    pub authority_priority: Vec<String>,
    /// Fail with [`ProjError::AmbiguousDefinition`] instead of picking a candidate.
    pub reject_ambiguous: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            authority_priority: ["EPSG", "ESRI", "IGNF", "OGC"]
                .into_iter()
                .map(String::from)
                .collect(),
            reject_ambiguous: false,
        }
    }
}

impl ParserOptions {
    fn rank(&self, authority: Option<&str>) -> usize {
        authority
            .and_then(|auth| {
                self.authority_priority
                    .iter()
                    .position(|preferred| preferred.eq_ignore_ascii_case(auth))
            })
            .unwrap_or(self.authority_priority.len())
    }
}

/// Canonical form of a resolved CRS.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedCrs {
    pub definition: String,
    pub kind: CrsKind,
    pub name: String,
    pub confidence: Option<f64>,
}

pub(crate) fn parse(
    input: &CrsInput,
    data_dir: &DataDir,
    options: &ParserOptions,
) -> Result<ParsedCrs, ProjError> {
    let ctx = Rc::new(ThreadContext::new(data_dir));
    let (pj, confidence) = match input {
        CrsInput::Wkt(text) => (Pj::from_wkt(ctx, text)?, None),
        CrsInput::ProjString(text) => (Pj::from_definition(ctx, &with_crs_type(text))?, None),
        CrsInput::Json(text) => (Pj::from_definition(ctx, text)?, None),
        CrsInput::Parameters(params) => {
            if params.is_empty() {
                return Err(ProjError::InvalidDefinition(
                    "empty parameter mapping".to_string(),
                ));
            }
            let definition = params_to_proj_string(params);
            (Pj::from_definition(ctx, &with_crs_type(&definition))?, None)
        }
        CrsInput::Authority { authority, code } => {
            require_database(&ctx, data_dir)?;
            (Pj::from_database(ctx, authority, code)?, None)
        }
        CrsInput::Other(text) => resolve_other(ctx, text, options)?,
    };
    if !pj.is_crs() {
        return Err(ProjError::InvalidDefinition(format!(
            "{input} does not describe a coordinate reference system"
        )));
    }
    ParsedCrs::from_pj(&pj, confidence)
}

impl ParsedCrs {
    pub fn from_pj(pj: &Pj, confidence: Option<f64>) -> Result<Self, ProjError> {
        Ok(ParsedCrs {
            definition: canonical_definition(pj)?,
            kind: CrsKind::of(pj),
            name: pj.name().unwrap_or_default(),
            confidence,
        })
    }
}

/// The text every CRS is normalised to: WKT2:2019 when PROJ can express the CRS in it,
/// PROJJSON or a PROJ string otherwise.
fn canonical_definition(pj: &Pj) -> Result<String, ProjError> {
    pj.as_wkt(proj_sys::PJ_WKT_TYPE_PJ_WKT2_2019, false)
        .or_else(|_| pj.as_projjson(false))
        .or_else(|_| pj.as_proj_string())
}

fn require_database(ctx: &ThreadContext, data_dir: &DataDir) -> Result<(), ProjError> {
    match ctx.database_path() {
        Some(_) => Ok(()),
        None => Err(ProjError::DataDirNotFound {
            searched: data_dir.searched(),
        }),
    }
}

fn resolve_other(
    ctx: Rc<ThreadContext>,
    text: &str,
    options: &ParserOptions,
) -> Result<(Pj, Option<f64>), ProjError> {
    let mut candidates = if ctx.database_path().is_some() {
        Pj::search_crs_by_name(&ctx, text)?
    } else {
        Vec::new()
    };
    match candidates.len() {
        0 => Ok((Pj::from_definition(ctx, text)?, None)),
        1 => Ok((candidates.remove(0), None)),
        count => {
            if options.reject_ambiguous {
                return Err(ProjError::AmbiguousDefinition {
                    input: text.to_string(),
                    candidates: count,
                });
            }
            // stable, so database order breaks ties within an authority
            candidates.sort_by_key(|pj| options.rank(pj.id().as_ref().map(|(auth, _)| auth.as_str())));
            let chosen = candidates.remove(0);
            log::warn!(
                "{text:?} matches {count} CRSs, using {}",
                chosen
                    .id()
                    .map(|(auth, code)| format!("{auth}:{code}"))
                    .unwrap_or_else(|| chosen.name().unwrap_or_default())
            );
            Ok((chosen, Some(1.0 / count as f64)))
        }
    }
}

fn params_to_proj_string(params: &[(String, String)]) -> String {
    params
        .iter()
        .filter_map(|(key, value)| {
            let key = key.trim().trim_start_matches('+');
            match value.trim() {
                "" | "true" | "True" => Some(format!("+{key}")),
                "false" | "False" => None,
                value => Some(format!("+{key}={value}")),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// PROJ strings describe operations unless they are marked as a CRS.
fn with_crs_type(definition: &str) -> String {
    let marked = definition
        .split_whitespace()
        .any(|token| token.trim_start_matches('+') == "type=crs");
    if marked {
        definition.to_string()
    } else {
        format!("{definition} +type=crs")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_looks_like_wkt() {
        assert!(looks_like_wkt("GEOGCS[\"WGS 84\"]"));
        assert!(looks_like_wkt("GEOGCRS (\"WGS 84\""));
        assert!(looks_like_wkt("\n  BOUNDCRS["));
        assert!(!looks_like_wkt("GEOGCS"));
        assert!(!looks_like_wkt("PROJECTION[\"tmerc\"]"));
        assert!(!looks_like_wkt(""));
        assert!(!looks_like_wkt("[[[["));
        assert!(!looks_like_wkt("é[GEOGCS"));
        assert!(!looks_like_wkt("WGS 84"));
    }

    #[test]
    fn test_sniff() {
        assert!(matches!(CrsInput::sniff("PROJCS[\"x\"]"), CrsInput::Wkt(_)));
        assert!(matches!(
            CrsInput::sniff("+proj=longlat +datum=WGS84"),
            CrsInput::ProjString(_)
        ));
        assert!(matches!(
            CrsInput::sniff("proj=utm zone=33"),
            CrsInput::ProjString(_)
        ));
        assert!(matches!(CrsInput::sniff("{\"type\": \"GeographicCRS\"}"), CrsInput::Json(_)));
        assert_eq!(
            CrsInput::sniff("epsg:4326"),
            CrsInput::Authority {
                authority: "EPSG".to_string(),
                code: "4326".to_string()
            }
        );
        assert_eq!(CrsInput::sniff("4326"), CrsInput::from(4326));
        assert_eq!(CrsInput::sniff("IGNF:LAMB93"), CrsInput::from(("IGNF", "LAMB93")));
        assert!(matches!(
            CrsInput::sniff("urn:ogc:def:crs:EPSG::4326"),
            CrsInput::Other(_)
        ));
        assert!(matches!(CrsInput::sniff("WGS 84"), CrsInput::Other(_)));
    }

    #[test]
    fn test_params_to_proj_string() {
        let input = CrsInput::from_params([("proj", "utm"), ("zone", "33"), ("south", "true"), ("no_defs", "false")]);
        assert_eq!(input.to_string(), "+proj=utm +zone=33 +south");
        let mut map = HashMap::new();
        map.insert("proj", "longlat");
        map.insert("ellps", "WGS84");
        assert_eq!(CrsInput::from(map).to_string(), "+ellps=WGS84 +proj=longlat");
    }

    #[test]
    fn test_with_crs_type() {
        assert_eq!(with_crs_type("+proj=merc"), "+proj=merc +type=crs");
        assert_eq!(with_crs_type("+proj=merc +type=crs"), "+proj=merc +type=crs");
    }

    #[test]
    fn test_parse_forms_agree() {
        let data_dir = DataDir::global();
        let options = ParserOptions::default();
        let from_code = parse(&CrsInput::from(4326), &data_dir, &options).unwrap();
        let from_text = parse(&CrsInput::sniff("EPSG:4326"), &data_dir, &options).unwrap();
        assert_eq!(from_code, from_text);
        assert_eq!(from_code.kind, CrsKind::Geographic);
        assert_eq!(from_code.name, "WGS 84");
        let reparsed = parse(&CrsInput::sniff(&from_code.definition), &data_dir, &options).unwrap();
        assert_eq!(reparsed.definition, from_code.definition);
    }

    #[test]
    fn test_parse_rejects_operations_and_garbage() {
        let data_dir = DataDir::global();
        let options = ParserOptions::default();
        let err = parse(&CrsInput::sniff("GEOGCS[\"broken\""), &data_dir, &options).unwrap_err();
        assert!(matches!(err, ProjError::InvalidDefinition(_)));
        let err = parse(&CrsInput::Other("+proj=merc".to_string()), &data_dir, &options).unwrap_err();
        assert!(matches!(err, ProjError::InvalidDefinition(_)));
        let err = parse(&CrsInput::Parameters(Vec::new()), &data_dir, &options).unwrap_err();
        assert!(matches!(err, ProjError::InvalidDefinition(_)));
    }

    #[test]
    fn test_ambiguous_name() {
        let data_dir = DataDir::global();
        let parsed = parse(&CrsInput::sniff("WGS 84"), &data_dir, &ParserOptions::default()).unwrap();
        let confidence = parsed.confidence.unwrap();
        assert!(confidence > 0.0 && confidence < 1.0);

        let strict = ParserOptions {
            reject_ambiguous: true,
            ..ParserOptions::default()
        };
        let err = parse(&CrsInput::sniff("WGS 84"), &data_dir, &strict).unwrap_err();
        assert!(matches!(err, ProjError::AmbiguousDefinition { .. }));
    }

    #[test]
    fn test_rank() {
        let options = ParserOptions::default();
        assert!(options.rank(Some("EPSG")) < options.rank(Some("ESRI")));
        assert_eq!(options.rank(Some("ACME")), options.rank(None));
    }
}
