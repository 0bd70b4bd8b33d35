use std::env;
use std::fmt;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use engine::EngineSettings;
use pipeline::{DatasetSource, FilterRange, InvalidGeometryPolicy, PipelineConfig};

use crate::controls::clamped_range;

#[derive(Parser, Debug)]
#[command(author, version, about = "Classified polygon viewer over a remote columnar dataset")]
pub struct Args {
    /// HTTPS URL of the remote dataset (parquet or anything ST_Read opens)
    #[arg(long, env = "VIEWER_DATASET_URL")]
    pub dataset_url: String,

    /// Name of the view the dataset is registered under
    #[arg(long, env = "VIEWER_VIEW_NAME", default_value = "features")]
    pub view_name: String,

    #[arg(long, env = "VIEWER_FILTER_MIN", default_value_t = 1, allow_negative_numbers = true)]
    pub min: i32,

    #[arg(long, env = "VIEWER_FILTER_MAX", default_value_t = 25, allow_negative_numbers = true)]
    pub max: i32,

    /// Engine thread count (default: host parallelism)
    #[arg(long, env = "VIEWER_ENGINE_THREADS")]
    pub engine_threads: Option<usize>,

    /// Engine memory limit, e.g. 2GB
    #[arg(long, env = "VIEWER_ENGINE_MEMORY_LIMIT")]
    pub engine_memory_limit: Option<String>,

    /// What to do with rows whose geometry does not parse
    #[arg(long, env = "VIEWER_INVALID_GEOMETRY", value_enum, default_value_t = GeometryPolicyArg::Skip)]
    pub invalid_geometry: GeometryPolicyArg,

    /// Write the styled collection as GeoJSON after every load
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Exit after the first load or failure instead of reading ranges from stdin
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum GeometryPolicyArg {
    Skip,
    Abort,
}

impl From<GeometryPolicyArg> for InvalidGeometryPolicy {
    fn from(arg: GeometryPolicyArg) -> Self {
        match arg {
            GeometryPolicyArg::Skip => InvalidGeometryPolicy::Skip,
            GeometryPolicyArg::Abort => InvalidGeometryPolicy::Abort,
        }
    }
}

/// Basemap access credential, injected from the environment.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BasemapConfig {
    pub token: Option<AccessToken>,
}

impl BasemapConfig {
    pub const TOKEN_VAR: &'static str = "VIEWER_BASEMAP_TOKEN";

    pub fn from_env() -> Self {
        Self::from_token(env::var(Self::TOKEN_VAR).ok())
    }

    fn from_token(token: Option<String>) -> Self {
        Self {
            token: token
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .map(AccessToken),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ViewerConfig {
    pub pipeline: PipelineConfig,
    pub engine: EngineSettings,
    pub initial_range: FilterRange,
    pub basemap: BasemapConfig,
    pub out: Option<PathBuf>,
    pub once: bool,
}

impl ViewerConfig {
    pub fn from_args(args: Args, basemap: BasemapConfig) -> Self {
        let mut pipeline =
            PipelineConfig::new(DatasetSource::new(args.dataset_url).with_view_name(args.view_name));
        pipeline.invalid_geometry = args.invalid_geometry.into();

        Self {
            pipeline,
            engine: EngineSettings {
                threads: args.engine_threads,
                memory_limit: args.engine_memory_limit,
            },
            initial_range: clamped_range(args.min, args.max),
            basemap,
            out: args.out,
            once: args.once,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AccessToken, Args, BasemapConfig, ViewerConfig};
    use clap::Parser;
    use pipeline::{FilterRange, InvalidGeometryPolicy};

    #[test]
    fn builds_config_from_arguments() {
        let args = Args::try_parse_from([
            "viewer",
            "--dataset-url",
            "https://example.test/lc.parquet",
            "--min",
            "0",
            "--max",
            "12",
            "--invalid-geometry",
            "abort",
            "--engine-threads",
            "2",
        ])
        .expect("parse");
        let config = ViewerConfig::from_args(args, BasemapConfig::default());
        assert_eq!(config.pipeline.source.url, "https://example.test/lc.parquet");
        assert_eq!(config.initial_range, FilterRange::new(1, 12));
        assert_eq!(config.pipeline.invalid_geometry, InvalidGeometryPolicy::Abort);
        assert_eq!(config.engine.threads, Some(2));
        assert!(!config.once);
    }

    #[test]
    fn blank_token_counts_as_missing() {
        assert_eq!(BasemapConfig::from_token(Some("  ".to_string())).token, None);
        assert_eq!(
            BasemapConfig::from_token(Some("pk.abc".to_string())).token,
            Some(AccessToken::new("pk.abc"))
        );
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let config = BasemapConfig::from_token(Some("pk.secret".to_string()));
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret"));
    }
}
