//! Build report.
//!
//! After a successful build the emitted JS/CSS/JSON files are listed with
//! their raw and gzipped sizes, followed by a timestamp, content hash and
//! wall-clock duration.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use colored::Colorize;
use flate2::write::GzEncoder;
use flate2::Compression;
use rolldown_common::{Output, StrOrBytes};
use sha2::{Digest, Sha256};

use crate::utils::posix_join;
use crate::BuildError;

/// One emitted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsAsset {
    pub name: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStats {
    pub assets: Vec<StatsAsset>,
    pub hash: String,
    pub duration: Duration,
}

fn output_parts(output: &Output) -> (&str, &[u8]) {
    match output {
        Output::Chunk(c) => (c.filename.as_str(), c.code.as_bytes()),
        Output::Asset(a) => (
            a.filename.as_str(),
            match &a.source {
                StrOrBytes::Str(s) => s.as_bytes(),
                StrOrBytes::Bytes(b) => b.as_slice(),
            },
        ),
    }
}

impl BuildStats {
    /// Collect stats from the outputs of every bundler in emission order.
    pub fn collect<'a>(outputs: impl IntoIterator<Item = &'a Output>, duration: Duration) -> Self {
        let mut hasher = Sha256::new();
        let mut assets = Vec::new();
        for output in outputs {
            let (name, content) = output_parts(output);
            hasher.update(name.as_bytes());
            hasher.update(content);
            assets.push(StatsAsset {
                name: name.to_string(),
                size: content.len(),
            });
        }
        let mut hash = hex::encode(hasher.finalize());
        hash.truncate(20);
        Self {
            assets,
            hash,
            duration,
        }
    }
}

pub fn format_size(bytes: usize) -> String {
    format!("{:.2} KiB", bytes as f64 / 1024.0)
}

/// Gzipped size of `bytes` at the default compression level.
pub fn gzipped_size(bytes: &[u8]) -> Result<usize, BuildError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?.len())
}

fn is_js(name: &str) -> bool {
    name.ends_with(".js")
}

fn is_css(name: &str) -> bool {
    name.ends_with(".css")
}

fn is_json(name: &str) -> bool {
    name.ends_with(".json")
}

fn is_min_js(name: &str) -> bool {
    name.ends_with(".min.js") || name.ends_with(".prod.js")
}

fn kind_rank(name: &str) -> u8 {
    if is_js(name) {
        0
    } else if is_json(name) {
        1
    } else {
        2
    }
}

/// Assets shown in the table: query strings stripped, first occurrence of
/// each name kept, JS/CSS/JSON only. JS comes first (minified bundles
/// leading), then JSON, then CSS; larger files first within a group.
pub fn listed_assets(assets: &[StatsAsset]) -> Vec<StatsAsset> {
    let mut seen = HashSet::new();
    let mut listed: Vec<StatsAsset> = assets
        .iter()
        .map(|a| StatsAsset {
            name: a.name.split('?').next().unwrap_or_default().to_string(),
            size: a.size,
        })
        .filter(|a| seen.insert(a.name.clone()))
        .filter(|a| is_js(&a.name) || is_css(&a.name) || is_json(&a.name))
        .collect();

    listed.sort_by(|a, b| {
        kind_rank(&a.name)
            .cmp(&kind_rank(&b.name))
            .then_with(|| is_min_js(&b.name).cmp(&is_min_js(&a.name)))
            .then_with(|| b.size.cmp(&a.size))
    });
    listed
}

fn make_row(file: &str, size: &str, gzipped: &str) -> String {
    format!("  {file}\t    {size}\t {gzipped}")
}

/// Render the stats table.
///
/// `dir` is the output directory as shown to the user (relative to `root`);
/// gzipped sizes are measured from the files under `root/dir`.
pub fn format_stats(stats: &BuildStats, dir: &str, root: &Path) -> Result<String, BuildError> {
    let mut rows = Vec::new();
    for asset in listed_assets(&stats.assets) {
        let display = posix_join(&[dir, &asset.name]);
        let bytes = std::fs::read(root.join(dir).join(&asset.name))?;
        let file = if asset.name.ends_with("js") {
            display.green().to_string()
        } else {
            display.blue().to_string()
        };
        rows.push(make_row(
            &file,
            &format_size(asset.size),
            &format_size(gzipped_size(&bytes)?),
        ));
    }

    let header = make_row(
        &"File".cyan().bold().to_string(),
        &"Size".cyan().bold().to_string(),
        &"Gzipped".cyan().bold().to_string(),
    );
    let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let info = format!(
        "Build at: {} - Hash: {} - Time: {}ms",
        now.white(),
        stats.hash.white(),
        stats.duration.as_millis().to_string().white()
    );

    Ok(format!(
        "{header}\n\n{}\n\n  {}\n  {info}\n",
        rows.join("\n"),
        "Images and other types of assets omitted.".bright_black()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn asset(name: &str, size: usize) -> StatsAsset {
        StatsAsset {
            name: name.to_string(),
            size,
        }
    }

    fn names(assets: &[StatsAsset]) -> Vec<&str> {
        assets.iter().map(|a| a.name.as_str()).collect()
    }

    #[test]
    fn filters_maps_and_other_types() {
        let listed = listed_assets(&[
            asset("index.js", 10),
            asset("index.js.map", 100),
            asset("logo.png", 50),
            asset("meta.json", 5),
        ]);
        assert_eq!(names(&listed), vec!["index.js", "meta.json"]);
    }

    #[test]
    fn strips_query_and_dedupes() {
        let listed = listed_assets(&[asset("index.js?v=1", 10), asset("index.js", 20)]);
        assert_eq!(listed, vec![asset("index.js", 10)]);
    }

    #[test]
    fn sort_order() {
        let listed = listed_assets(&[
            asset("index.css", 900),
            asset("meta.js", 300),
            asset("index.js", 500),
            asset("index.min.js", 100),
            asset("meta.prod.js", 50),
            asset("assets.json", 1000),
        ]);
        assert_eq!(
            names(&listed),
            vec![
                "index.min.js",
                "meta.prod.js",
                "index.js",
                "meta.js",
                "assets.json",
                "index.css"
            ]
        );
    }

    #[test]
    fn sizes_in_kib() {
        assert_eq!(format_size(0), "0.00 KiB");
        assert_eq!(format_size(1536), "1.50 KiB");
    }

    #[test]
    fn gzip_shrinks_repetitive_input() {
        let input = "a".repeat(10_000);
        let size = gzipped_size(input.as_bytes()).unwrap();
        assert!(size > 0 && size < 1_000);
    }

    #[test]
    fn format_lists_js_before_json() {
        let root = tempfile::tempdir().unwrap();
        let dist = root.path().join("dist");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::write(dist.join("index.js"), "console.log(1)").unwrap();
        std::fs::write(dist.join("index.js.map"), "{}").unwrap();
        std::fs::write(dist.join("meta.json"), "{\"a\":1}").unwrap();

        let stats = BuildStats {
            assets: vec![asset("meta.json", 7), asset("index.js.map", 2), asset("index.js", 14)],
            hash: "0123456789abcdef0123".into(),
            duration: Duration::from_millis(42),
        };
        let report = format_stats(&stats, "dist", root.path()).unwrap();

        assert!(!report.contains("index.js.map"));
        let js = report.find("dist/index.js").unwrap();
        let json = report.find("dist/meta.json").unwrap();
        assert!(js < json);
        assert!(report.contains("Images and other types of assets omitted."));
        assert!(report.contains("0123456789abcdef0123"));
        assert!(report.contains("42"));

        let index_row = report.lines().find(|l| l.contains("dist/index.js")).unwrap();
        let gzipped = index_row.rsplit('\t').next().unwrap().trim();
        assert!(gzipped.ends_with(" KiB"));
        assert!(gzipped.len() > " KiB".len());
    }

    #[test]
    fn missing_file_is_io_error() {
        let root = tempfile::tempdir().unwrap();
        let stats = BuildStats {
            assets: vec![asset("index.js", 1)],
            hash: String::new(),
            duration: Duration::ZERO,
        };
        assert!(matches!(
            format_stats(&stats, "dist", root.path()),
            Err(BuildError::Io(_))
        ));
    }
}
