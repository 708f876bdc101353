//! fitcourse - convert a GPX file into a FIT course
//!
//! Usage:
//!   fitcourse ride.gpx ride.fit
//!   fitcourse ride.gpx ride.fit --name "Sunday loop" --tolerance 5 -t
//!   fitcourse ride.gpx ride.fit --config options.json --inject-course-points

use anyhow::{Context, Result};
use clap::Parser;
use fitcourse::Options;
use log::{info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fitcourse")]
#[command(version, about = "Convert GPX tracks, routes and waypoints into a FIT course", long_about = None)]
struct Cli {
    /// GPX file to read
    input: PathBuf,

    /// FIT file to write
    output: PathBuf,

    /// Course name (defaults to the input file name)
    #[arg(short, long)]
    name: Option<String>,

    /// JSON file with conversion options; flags override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Synthesized speed in m/s
    #[arg(long)]
    speed: Option<f64>,

    /// Measure segments without elevation
    #[arg(long)]
    no_3d: bool,

    /// Ignore timestamps from the input
    #[arg(long)]
    force_speed: bool,

    /// Add Start, End and periodic course points along the track
    #[arg(long)]
    inject_course_points: bool,

    /// Adjust speed for slope
    #[arg(long)]
    walking_grade: bool,

    /// Minimum spacing of records in meters
    #[arg(long)]
    min_route_point_distance: Option<f64>,

    /// Minimum spacing of injected course points in meters
    #[arg(long)]
    min_course_point_distance: Option<f64>,

    /// Target number of records, 0 for unlimited
    #[arg(long)]
    max_points: Option<u32>,

    /// Track simplification tolerance in meters, 0 disables it
    #[arg(long)]
    tolerance: Option<f64>,

    /// Read tracks
    #[arg(short = 't', long)]
    tracks: bool,

    /// Read routes
    #[arg(short = 'r', long)]
    routes: bool,

    /// Read waypoints
    #[arg(short = 'w', long)]
    waypoints: bool,

    /// Enable verbose debug output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => {
                let file = File::open(path)
                    .with_context(|| format!("cannot open config {}", path.display()))?;
                Options::from_json_reader(BufReader::new(file))
                    .with_context(|| format!("cannot parse config {}", path.display()))?
            }
            None => Options::default(),
        };

        if let Some(speed) = self.speed {
            options.speed = speed;
        }
        if self.no_3d {
            options.use_3d_distance = false;
        }
        options.force_speed |= self.force_speed;
        options.inject_course_points |= self.inject_course_points;
        options.walking_grade |= self.walking_grade;
        if let Some(d) = self.min_route_point_distance {
            options.min_route_point_distance = d;
        }
        if let Some(d) = self.min_course_point_distance {
            options.min_course_point_distance = d;
        }
        if let Some(n) = self.max_points {
            options.max_points = n;
        }
        if let Some(t) = self.tolerance {
            options.tolerance = t;
        }

        // Any category flag narrows the input to the named ones
        if self.tracks || self.routes || self.waypoints {
            options.tracks = self.tracks;
            options.routes = self.routes;
            options.waypoints = self.waypoints;
        }

        Ok(options)
    }

    fn course_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => default_name(&self.input),
        }
    }
}

fn default_name(input: &Path) -> String {
    input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Course".to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "[{:5}] {}", record.level(), record.args()))
        .init();

    let options = cli.options()?;
    let name = cli.course_name();

    let summary = fitcourse::convert_file(&cli.input, &cli.output, &name, &options)
        .with_context(|| {
            format!(
                "cannot convert {} to {}",
                cli.input.display(),
                cli.output.display()
            )
        })?;

    match summary {
        Some(s) => info!(
            "Course {:?}: {} records, {} course points, {:.0} m, {} s",
            name,
            s.records,
            s.course_points,
            s.total_distance,
            s.duration_ms / 1000
        ),
        None => warn!("{} has no points, wrote an empty course", cli.input.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn defaults_without_flags() {
        let cli = parse(&["fitcourse", "in.gpx", "out.fit"]);
        assert_eq!(cli.options().unwrap(), Options::default());
        assert_eq!(cli.course_name(), "in");
    }

    #[test]
    fn category_flags_select_sources() {
        let cli = parse(&["fitcourse", "in.gpx", "out.fit", "-t", "-w"]);
        let options = cli.options().unwrap();
        assert!(options.tracks);
        assert!(!options.routes);
        assert!(options.waypoints);
    }

    #[test]
    fn flags_override_defaults() {
        let cli = parse(&[
            "fitcourse",
            "in.gpx",
            "out.fit",
            "--name",
            "Loop",
            "--speed",
            "3.5",
            "--no-3d",
            "--max-points",
            "0",
            "--tolerance",
            "5",
            "--inject-course-points",
        ]);
        let options = cli.options().unwrap();
        assert_eq!(options.speed, 3.5);
        assert!(!options.use_3d_distance);
        assert_eq!(options.max_points, 0);
        assert_eq!(options.tolerance, 5.0);
        assert!(options.inject_course_points);
        assert_eq!(cli.course_name(), "Loop");
    }

    #[test]
    fn missing_config_is_an_error() {
        let cli = parse(&["fitcourse", "in.gpx", "out.fit", "--config", "/nonexistent/options.json"]);
        assert!(cli.options().is_err());
    }
}
