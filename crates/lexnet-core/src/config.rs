//! Run configurations and their file identities.
//!
//! Every artifact the pipeline writes is addressed by the configuration that
//! produced it. The encoding is a flat `_`-separated filename:
//!
//! ```text
//! {snapshot}_{ratio}_{decay}_{merge}[_o{co}][_t-{type}][_a-{method}][_n{n}][_m{markov}][_s{seed}][_c{consensus}]
//! ```
//!
//! with every `.` replaced by `-`. Decoding keeps the first character of a
//! numeric component (so negative values survive) and turns the remaining
//! `-` back into `.`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigError, LexnetError, Result};

/// Community detection method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    Infomap,
    InfomapDirected,
    Louvain,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Infomap => "infomap",
            Method::InfomapDirected => "infomap-directed",
            Method::Louvain => "louvain",
        }
    }

    /// Flow-based methods keep the multigraph, louvain wants a simple graph.
    pub fn is_flow_based(&self) -> bool {
        matches!(self, Method::Infomap | Method::InfomapDirected)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = LexnetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "infomap" => Ok(Method::Infomap),
            "infomap-directed" => Ok(Method::InfomapDirected),
            "louvain" => Ok(Method::Louvain),
            _ => Err(ConfigError::UnknownMethod(s.to_string()).into()),
        }
    }
}

/// Granularity at which decision networks are quotiented before counting
/// co-occurrences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CooccurrenceType {
    /// One node per decision document.
    Decision,
    /// One node per decision paragraph.
    Paragraph,
}

impl CooccurrenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CooccurrenceType::Decision => "decision",
            CooccurrenceType::Paragraph => "paragraph",
        }
    }
}

impl fmt::Display for CooccurrenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CooccurrenceType {
    type Err = LexnetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "decision" => Ok(CooccurrenceType::Decision),
            "paragraph" => Ok(CooccurrenceType::Paragraph),
            _ => Err(ConfigError::UnknownCooccurrenceType(s.to_string()).into()),
        }
    }
}

/// One point of the parameter space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub snapshot: String,
    pub pp_ratio: f64,
    pub pp_decay: f64,
    /// Contraction threshold, `-1` for structural contraction.
    pub pp_merge: i64,
    #[serde(default)]
    pub pp_co_occurrence: Option<f64>,
    #[serde(default)]
    pub pp_co_occurrence_type: Option<CooccurrenceType>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub markov_time: Option<f64>,
    #[serde(default)]
    pub consensus: u32,
    #[serde(default)]
    pub number_of_modules: Option<u32>,
    #[serde(default)]
    pub method: Option<Method>,
}

impl RunConfig {
    /// Configuration with only the preprocessing core set.
    pub fn new(snapshot: impl Into<String>, pp_ratio: f64, pp_decay: f64, pp_merge: i64) -> Self {
        Self {
            snapshot: snapshot.into(),
            pp_ratio,
            pp_decay,
            pp_merge,
            pp_co_occurrence: None,
            pp_co_occurrence_type: None,
            seed: None,
            markov_time: None,
            consensus: 0,
            number_of_modules: None,
            method: None,
        }
    }

    pub fn with_snapshot(&self, snapshot: impl Into<String>) -> Self {
        Self {
            snapshot: snapshot.into(),
            ..self.clone()
        }
    }

    /// Encoded filename with `ext` appended verbatim (e.g. `".json"`).
    pub fn filename(&self, ext: &str) -> String {
        let mut name = format!(
            "{}_{}_{}_{}",
            self.snapshot,
            fmt_float(self.pp_ratio),
            fmt_float(self.pp_decay),
            self.pp_merge
        );
        if let Some(co) = self.pp_co_occurrence.filter(|v| *v != 0.0) {
            name.push_str(&format!("_o{}", fmt_float(co)));
            if let Some(t) = self.pp_co_occurrence_type {
                name.push_str(&format!("_t-{t}"));
            }
        }
        if let Some(method) = self.method {
            name.push_str(&format!("_a-{method}"));
        }
        let modules = match self.method {
            Some(Method::Louvain) => None,
            _ => self.number_of_modules.filter(|n| *n != 0),
        };
        if let Some(n) = modules {
            name.push_str(&format!("_n{n}"));
        }
        if let Some(m) = self.markov_time.filter(|v| *v != 0.0) {
            name.push_str(&format!("_m{}", fmt_float(m)));
        }
        if let Some(seed) = self.seed {
            name.push_str(&format!("_s{seed}"));
        }
        if self.consensus != 0 {
            name.push_str(&format!("_c{}", self.consensus));
        }
        name.replace('.', "-") + ext
    }

    /// Filename without extension.
    pub fn stem(&self) -> String {
        self.filename("")
    }

    /// Filename with the snapshot left out, used to find all snapshots of
    /// one configuration by suffix.
    pub fn snapshot_suffix(&self, ext: &str) -> String {
        self.with_snapshot("").filename(ext)
    }

    /// Decode a filename produced by [`RunConfig::filename`]. Anything after
    /// the first `.` is treated as extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let base = filename.rsplit('/').next().unwrap_or(filename);
        let stem = base.split('.').next().unwrap_or(base);
        let invalid = |reason: String| -> LexnetError {
            ConfigError::InvalidFilename {
                filename: filename.to_string(),
                reason,
            }
            .into()
        };

        let components: Vec<&str> = stem.split('_').collect();
        if components.len() < 4 {
            return Err(invalid(format!(
                "expected at least 4 components, found {}",
                components.len()
            )));
        }

        let mut config = RunConfig::new(
            components[0],
            parse_component(components[1]).map_err(&invalid)?,
            parse_component(components[2]).map_err(&invalid)?,
            parse_component(components[3]).map_err(&invalid)?,
        );

        for component in &components[4..] {
            if let Some(rest) = component.strip_prefix("t-") {
                config.pp_co_occurrence_type = Some(rest.parse()?);
            } else if let Some(rest) = component.strip_prefix("a-") {
                config.method = Some(rest.parse()?);
            } else if let Some(rest) = component.strip_prefix('o') {
                config.pp_co_occurrence = Some(parse_component(rest).map_err(&invalid)?);
            } else if let Some(rest) = component.strip_prefix('n') {
                config.number_of_modules = Some(parse_component(rest).map_err(&invalid)?);
            } else if let Some(rest) = component.strip_prefix('m') {
                config.markov_time = Some(parse_component(rest).map_err(&invalid)?);
            } else if let Some(rest) = component.strip_prefix('s') {
                config.seed = Some(parse_component(rest).map_err(&invalid)?);
            } else if let Some(rest) = component.strip_prefix('c') {
                config.consensus = parse_component(rest).map_err(&invalid)?;
            } else {
                return Err(invalid(format!("unknown component '{component}'")));
            }
        }
        Ok(config)
    }

    /// Canonical form: every parameter the filename leaves out is unset, so
    /// `from_filename(c.filename(..)) == c.normalized()`.
    pub fn normalized(&self) -> Self {
        let pp_co_occurrence = self.pp_co_occurrence.filter(|v| *v != 0.0);
        Self {
            pp_co_occurrence,
            pp_co_occurrence_type: pp_co_occurrence.and(self.pp_co_occurrence_type),
            number_of_modules: match self.method {
                Some(Method::Louvain) => None,
                _ => self.number_of_modules.filter(|n| *n != 0),
            },
            markov_time: self.markov_time.filter(|v| *v != 0.0),
            ..self.clone()
        }
    }

    /// Projection onto the preprocessing parameters. Configurations that
    /// differ only in clustering parameters share one preprocessed graph.
    pub fn preprocessing_projection(&self) -> Self {
        Self {
            seed: None,
            markov_time: None,
            consensus: 0,
            number_of_modules: None,
            method: None,
            ..self.clone()
        }
    }

    /// Co-occurrence edge weight multiplier (`pp_co_occurrence` if positive).
    pub fn co_occurrence_weight(&self) -> f64 {
        match self.pp_co_occurrence {
            Some(w) if w > 0.0 => w,
            _ => 1.0,
        }
    }

    pub fn uses_co_occurrence(&self) -> bool {
        self.pp_co_occurrence.map_or(false, |v| v != 0.0)
    }
}

impl fmt::Display for RunConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

/// Decimal rendering with a trailing `.0` for integral values.
fn fmt_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn parse_component<T: FromStr>(text: &str) -> std::result::Result<T, String> {
    let mut chars = text.chars();
    let first = chars
        .next()
        .ok_or_else(|| "empty numeric component".to_string())?;
    let restored: String = std::iter::once(first)
        .chain(chars.map(|c| if c == '-' { '.' } else { c }))
        .collect();
    restored
        .parse()
        .map_err(|_| format!("'{text}' is not a number"))
}

/// Cartesian parameter sweep.
///
/// An empty optional list means the parameter stays unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpace {
    #[serde(default = "default_pp_ratios")]
    pub pp_ratios: Vec<f64>,
    #[serde(default = "default_pp_decays")]
    pub pp_decays: Vec<f64>,
    #[serde(default = "default_pp_merges")]
    pub pp_merges: Vec<i64>,
    #[serde(default)]
    pub pp_co_occurrences: Vec<f64>,
    #[serde(default)]
    pub pp_co_occurrence_types: Vec<CooccurrenceType>,
    #[serde(default)]
    pub markov_times: Vec<f64>,
    #[serde(default = "default_consensus")]
    pub consensus: Vec<u32>,
    #[serde(default)]
    pub seeds: Vec<u64>,
    #[serde(default)]
    pub numbers_of_modules: Vec<u32>,
    #[serde(default = "default_methods")]
    pub methods: Vec<Method>,
}

fn default_pp_ratios() -> Vec<f64> {
    vec![1.0]
}
fn default_pp_decays() -> Vec<f64> {
    vec![1.0]
}
fn default_pp_merges() -> Vec<i64> {
    vec![-1]
}
fn default_consensus() -> Vec<u32> {
    vec![0]
}
fn default_methods() -> Vec<Method> {
    vec![Method::Infomap]
}

impl Default for ConfigSpace {
    fn default() -> Self {
        Self {
            pp_ratios: default_pp_ratios(),
            pp_decays: default_pp_decays(),
            pp_merges: default_pp_merges(),
            pp_co_occurrences: Vec::new(),
            pp_co_occurrence_types: Vec::new(),
            markov_times: Vec::new(),
            consensus: default_consensus(),
            seeds: Vec::new(),
            numbers_of_modules: Vec::new(),
            methods: default_methods(),
        }
    }
}

fn optional<T: Copy>(values: &[T]) -> Vec<Option<T>> {
    if values.is_empty() {
        vec![None]
    } else {
        values.iter().copied().map(Some).collect()
    }
}

impl ConfigSpace {
    /// Every configuration for every snapshot, in product order
    /// snapshot, ratio, decay, merge, co-occurrence, type, markov time,
    /// consensus, seed, modules, method.
    ///
    /// Configurations are [normalized](RunConfig::normalized), and those
    /// sharing a filename are kept once.
    pub fn expand<S: AsRef<str>>(&self, snapshots: &[S]) -> Vec<RunConfig> {
        let consensus = if self.consensus.is_empty() {
            vec![0]
        } else {
            self.consensus.clone()
        };
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for snapshot in snapshots {
            for &pp_ratio in &self.pp_ratios {
                for &pp_decay in &self.pp_decays {
                    for &pp_merge in &self.pp_merges {
                        for co in optional(&self.pp_co_occurrences) {
                            for co_type in optional(&self.pp_co_occurrence_types) {
                                for markov in optional(&self.markov_times) {
                                    for &cons in &consensus {
                                        for seed in optional(&self.seeds) {
                                            for n in optional(&self.numbers_of_modules) {
                                                for method in optional(&self.methods) {
                                                    let config = RunConfig {
                                                        snapshot: snapshot.as_ref().to_string(),
                                                        pp_ratio,
                                                        pp_decay,
                                                        pp_merge,
                                                        pp_co_occurrence: co,
                                                        pp_co_occurrence_type: co_type,
                                                        seed,
                                                        markov_time: markov,
                                                        consensus: cons,
                                                        number_of_modules: n,
                                                        method,
                                                    }
                                                    .normalized();
                                                    if seen.insert(config.stem()) {
                                                        out.push(config);
                                                    }
                                                }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        out
    }

    /// Snapshot-less expansion: every configuration has an empty snapshot.
    pub fn expand_all(&self) -> Vec<RunConfig> {
        self.expand(&[""])
    }

    /// Distinct upstream configurations, first occurrence order.
    pub fn preprocessing_configs<S: AsRef<str>>(&self, snapshots: &[S]) -> Vec<RunConfig> {
        let mut seen = HashSet::new();
        self.expand(snapshots)
            .into_iter()
            .map(|c| c.preprocessing_projection())
            .filter(|c| seen.insert(c.stem()))
            .collect()
    }

    /// Reject values that cannot be encoded into a filename.
    pub fn validate(&self) -> Result<()> {
        for v in self
            .pp_ratios
            .iter()
            .chain(&self.pp_decays)
            .chain(&self.pp_co_occurrences)
            .chain(&self.markov_times)
        {
            if !v.is_finite() {
                return Err(LexnetError::invalid_config(
                    "sweep",
                    v.to_string(),
                    "values must be finite",
                ));
            }
        }
        if self.pp_ratios.iter().any(|r| *r < 0.0) {
            return Err(LexnetError::invalid_config(
                "pp_ratios",
                format!("{:?}", self.pp_ratios),
                "ratios must not be negative",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> RunConfig {
        RunConfig {
            snapshot: "x".into(),
            pp_ratio: 1.0,
            pp_decay: 2.0,
            pp_merge: 3,
            pp_co_occurrence: Some(4.0),
            pp_co_occurrence_type: Some(CooccurrenceType::Decision),
            seed: Some(1234),
            markov_time: Some(1.0),
            consensus: 1000,
            number_of_modules: Some(100),
            method: Some(Method::Infomap),
        }
    }

    #[test]
    fn encodes_every_segment_in_order() {
        assert_eq!(
            full().filename(".json"),
            "x_1-0_2-0_3_o4-0_t-decision_a-infomap_n100_m1-0_s1234_c1000.json"
        );
    }

    #[test]
    fn decodes_what_it_encodes() {
        let config = full();
        let decoded = RunConfig::from_filename(&config.filename(".json")).unwrap();
        assert_eq!(decoded, config);

        let mut negative = RunConfig::new("2019-01-01", 0.5, 0.0, -1);
        negative.pp_co_occurrence = Some(-2.0);
        negative.method = Some(Method::InfomapDirected);
        negative.seed = Some(0);
        let name = negative.filename(".json");
        assert_eq!(name, "2019-01-01_0-5_0-0_-1_o-2-0_a-infomap-directed_s0.json");
        assert_eq!(RunConfig::from_filename(&name).unwrap(), negative);
    }

    #[test]
    fn zero_values_are_omitted_but_seed_zero_is_written() {
        let mut c = RunConfig::new("s", 1.0, 1.0, 0);
        c.markov_time = Some(0.0);
        c.pp_co_occurrence = Some(0.0);
        c.seed = Some(0);
        assert_eq!(c.stem(), "s_1-0_1-0_0_s0");
    }

    #[test]
    fn louvain_drops_module_count() {
        let mut c = full();
        c.method = Some(Method::Louvain);
        assert!(!c.stem().contains("_n100"));
    }

    #[test]
    fn projection_clears_clustering_parameters() {
        let p = full().preprocessing_projection();
        assert_eq!(p.stem(), "x_1-0_2-0_3_o4-0_t-decision");
        let mut other = full();
        other.seed = Some(7);
        other.method = Some(Method::Louvain);
        assert_eq!(other.preprocessing_projection().stem(), p.stem());
    }

    #[test]
    fn unknown_method_and_component_are_rejected() {
        let err = RunConfig::from_filename("x_1-0_1-0_0_a-awesome.json").unwrap_err();
        assert!(err.to_string().contains("awesome"));
        let err = RunConfig::from_filename("x_1-0_1-0_0_q5.json").unwrap_err();
        assert!(matches!(
            err,
            LexnetError::Config(ConfigError::InvalidFilename { .. })
        ));
        assert!(RunConfig::from_filename("x_1-0.json").is_err());
        assert!("LOUVAIN".parse::<Method>().is_ok());
        assert!("bogus".parse::<CooccurrenceType>().is_err());
    }

    #[test]
    fn expansion_follows_product_order() {
        let space = ConfigSpace {
            pp_ratios: vec![1.0, 2.0],
            seeds: vec![1, 2],
            methods: vec![Method::Infomap, Method::Louvain],
            ..ConfigSpace::default()
        };
        let configs = space.expand(&["2019", "2020"]);
        assert_eq!(configs.len(), 2 * 2 * 2 * 2);
        assert_eq!(configs[0].snapshot, "2019");
        assert_eq!(configs[0].method, Some(Method::Infomap));
        assert_eq!(configs[1].method, Some(Method::Louvain));
        assert_eq!(configs[2].seed, Some(2));
        assert_eq!(configs[4].pp_ratio, 2.0);
        assert_eq!(configs[8].snapshot, "2020");

        let pre = space.preprocessing_configs(&["2019", "2020"]);
        assert_eq!(pre.len(), 4);
        assert!(pre.iter().all(|c| c.method.is_none() && c.seed.is_none()));
        assert!(space.expand_all().iter().all(|c| c.snapshot.is_empty()));
    }

    #[test]
    fn expanded_configs_survive_their_filename() {
        let space = ConfigSpace {
            pp_co_occurrences: vec![0.0, 2.5],
            pp_co_occurrence_types: vec![CooccurrenceType::Paragraph],
            markov_times: vec![0.0, 0.5],
            seeds: vec![0],
            numbers_of_modules: vec![0, 4],
            methods: vec![Method::Infomap, Method::Louvain],
            ..ConfigSpace::default()
        };
        let configs = space.expand(&["2000"]);
        for config in &configs {
            let decoded = RunConfig::from_filename(&config.filename(".json")).unwrap();
            assert_eq!(&decoded, config, "{config}");
        }
        // louvain ignores the module count, so n0 and n4 collapse
        assert_eq!(configs.len(), 2 * 2 * (2 + 1));
    }

    #[test]
    fn normalizing_clears_unencoded_values() {
        let mut c = full();
        c.pp_co_occurrence = Some(0.0);
        c.markov_time = Some(0.0);
        c.number_of_modules = Some(0);
        let n = c.normalized();
        assert_eq!(n.pp_co_occurrence, None);
        assert_eq!(n.pp_co_occurrence_type, None);
        assert_eq!(n.markov_time, None);
        assert_eq!(n.number_of_modules, None);
        assert_eq!(n.stem(), c.stem());
        assert_eq!(full().normalized(), full());
    }

    #[test]
    fn space_deserializes_from_toml_like_json() {
        let space: ConfigSpace =
            serde_json::from_str(r#"{"methods":["infomap-directed"],"pp_merges":[-1,500]}"#)
                .unwrap();
        assert_eq!(space.methods, vec![Method::InfomapDirected]);
        assert_eq!(space.pp_ratios, vec![1.0]);
        assert!(space.validate().is_ok());
    }
}
