//! `quire.toml` loading and merging with command-line flags.
//!
//! Flags win over the file and the file wins over defaults.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use quire_content::{BuildParameters, Minify, Toggle};
use quire_server::{ServeConfig, DEFAULT_QUIET_WINDOW};
use serde::Deserialize;

/// Configuration file structure (quire.toml).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub serve: ServeSection,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    pub source: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub minify_html: Option<bool>,
    pub minify_css: Option<bool>,
    pub minify_js: Option<bool>,
    pub search: Option<bool>,
    pub rtl: Option<bool>,
    pub logo: Option<String>,
    pub style: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ServeSection {
    pub address: Option<SocketAddr>,
    pub quiet_ms: Option<u64>,
    pub watch: Option<bool>,
}

/// Build flags shared by `build` and `serve`.
#[derive(Debug, Default, Args)]
pub struct BuildArgs {
    /// Force search on
    #[arg(long)]
    pub search: bool,

    /// Force search off
    #[arg(long)]
    pub no_search: bool,

    /// Force right-to-left styles on
    #[arg(long)]
    pub rtl: bool,

    /// Force right-to-left styles off
    #[arg(long)]
    pub no_rtl: bool,

    /// Skip minification: any of html, css, js, or all
    #[arg(long, value_delimiter = ',')]
    pub no_minify: Vec<String>,

    /// Logo image name under images/
    #[arg(long)]
    pub logo: Option<String>,

    /// SCSS file layered in before every stylesheet
    #[arg(long)]
    pub style: Option<PathBuf>,
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if !path.exists() {
        return Ok(ConfigFile::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    tracing::info!("Loaded config from {}", path.display());

    Ok(config)
}

/// Merge flags and file settings into build parameters.
pub fn build_parameters(args: &BuildArgs, file: &BuildSection) -> Result<BuildParameters> {
    let search = toggle("search", args.search, args.no_search, file.search)?;
    let rtl = toggle("rtl", args.rtl, args.no_rtl, file.rtl)?;

    let mut minify = Minify {
        html: file.minify_html.unwrap_or(true),
        css: file.minify_css.unwrap_or(true),
        js: file.minify_js.unwrap_or(true),
    };
    for kind in &args.no_minify {
        match kind.trim() {
            "all" => minify = Minify::NONE,
            "html" => minify.html = false,
            "css" => minify.css = false,
            "js" => minify.js = false,
            other => bail!("Unknown --no-minify value '{other}' (expected html, css, js or all)"),
        }
    }

    Ok(BuildParameters {
        search,
        rtl,
        logo: args.logo.clone().or_else(|| file.logo.clone()),
        style_file: args.style.clone().or_else(|| file.style.clone()),
        minify,
    })
}

fn toggle(name: &str, on: bool, off: bool, file: Option<bool>) -> Result<Toggle> {
    match Toggle::from_flags(on, off) {
        None => bail!("--{name} and --no-{name} cannot be used together"),
        Some(Toggle::Unset) => Ok(file.into()),
        Some(flag) => Ok(flag),
    }
}

/// Source directory from the command line or the file.
pub fn source_dir(cli: Option<PathBuf>, file: &BuildSection) -> Option<PathBuf> {
    cli.or_else(|| file.source.clone())
}

/// Output directory from the command line, the file, or `build`.
pub fn output_dir(cli: Option<PathBuf>, file: &BuildSection) -> PathBuf {
    cli.or_else(|| file.output.clone())
        .unwrap_or_else(|| PathBuf::from("build"))
}

/// Serving settings. Watching needs a source directory.
pub fn serve_config(
    address: Option<SocketAddr>,
    no_watch: bool,
    source: Option<&Path>,
    file: &ServeSection,
) -> ServeConfig {
    let defaults = ServeConfig::default();
    let watch = !no_watch && file.watch.unwrap_or(true);

    ServeConfig {
        address: address.or(file.address).unwrap_or(defaults.address),
        watch: source.filter(|_| watch).map(Path::to_path_buf),
        quiet: file
            .quiet_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_QUIET_WINDOW),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn parse(text: &str) -> ConfigFile {
        toml::from_str(text).unwrap()
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();

        let config = load_config(&dir.path().join("quire.toml")).unwrap();

        assert!(config.build.source.is_none());
        assert!(config.serve.address.is_none());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("quire.toml");
        fs::write(&path, "[build]\nsearch = \"maybe\"\n").unwrap();

        assert!(load_config(&path).is_err());
    }

    #[test]
    fn reads_both_sections() {
        let config = parse(
            r#"
[build]
source = "docs"
output = "public"
minify_js = false
search = false
logo = "brand.png"

[serve]
address = "0.0.0.0:8080"
quiet_ms = 500
watch = false
"#,
        );

        assert_eq!(config.build.source, Some(PathBuf::from("docs")));
        assert_eq!(config.build.minify_js, Some(false));
        assert_eq!(config.serve.quiet_ms, Some(500));
        assert_eq!(config.serve.watch, Some(false));
    }

    #[test]
    fn defaults_without_flags_or_file() {
        let params = build_parameters(&BuildArgs::default(), &BuildSection::default()).unwrap();

        assert_eq!(params, BuildParameters::default());
    }

    #[test]
    fn file_fills_unset_flags() {
        let file = parse("[build]\nsearch = false\nrtl = true\nminify_css = false\nlogo = \"a.png\"\n");

        let params = build_parameters(&BuildArgs::default(), &file.build).unwrap();

        assert_eq!(params.search, Toggle::Disabled);
        assert_eq!(params.rtl, Toggle::Enabled);
        assert!(!params.minify.css);
        assert!(params.minify.js);
        assert_eq!(params.logo.as_deref(), Some("a.png"));
    }

    #[test]
    fn flags_win_over_file() {
        let file = parse("[build]\nsearch = false\nlogo = \"a.png\"\n");
        let args = BuildArgs {
            search: true,
            logo: Some("b.png".into()),
            no_minify: vec!["html".into()],
            ..Default::default()
        };

        let params = build_parameters(&args, &file.build).unwrap();

        assert_eq!(params.search, Toggle::Enabled);
        assert_eq!(params.logo.as_deref(), Some("b.png"));
        assert!(!params.minify.html);
        assert!(params.minify.css);
    }

    #[test]
    fn conflicting_toggle_flags_are_rejected() {
        let args = BuildArgs {
            rtl: true,
            no_rtl: true,
            ..Default::default()
        };

        let err = build_parameters(&args, &BuildSection::default()).unwrap_err();

        assert!(err.to_string().contains("--rtl and --no-rtl"));
    }

    #[test]
    fn no_minify_all_and_unknown() {
        let all = BuildArgs {
            no_minify: vec!["all".into()],
            ..Default::default()
        };
        assert_eq!(
            build_parameters(&all, &BuildSection::default()).unwrap().minify,
            Minify::NONE
        );

        let bad = BuildArgs {
            no_minify: vec!["images".into()],
            ..Default::default()
        };
        assert!(build_parameters(&bad, &BuildSection::default()).is_err());
    }

    #[test]
    fn output_falls_back_to_build() {
        let file = parse("[build]\noutput = \"public\"\n");

        assert_eq!(output_dir(None, &BuildSection::default()), PathBuf::from("build"));
        assert_eq!(output_dir(None, &file.build), PathBuf::from("public"));
        assert_eq!(
            output_dir(Some("site".into()), &file.build),
            PathBuf::from("site")
        );
    }

    #[test]
    fn watching_needs_a_source() {
        let serve = ServeSection::default();

        assert!(serve_config(None, false, None, &serve).watch.is_none());
        assert_eq!(
            serve_config(None, false, Some(Path::new("docs")), &serve).watch,
            Some(PathBuf::from("docs"))
        );
        assert!(serve_config(None, true, Some(Path::new("docs")), &serve)
            .watch
            .is_none());
    }

    #[test]
    fn serve_file_settings_apply() {
        let file = parse("[serve]\naddress = \"0.0.0.0:9000\"\nquiet_ms = 250\nwatch = false\n");

        let config = serve_config(None, false, Some(Path::new("docs")), &file.serve);

        assert_eq!(config.address, "0.0.0.0:9000".parse::<std::net::SocketAddr>().unwrap());
        assert_eq!(config.quiet, Duration::from_millis(250));
        assert!(config.watch.is_none());
    }
}
