//! Run identity and the remote layout derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp format naming the remote run directory and archive.
pub const STAMP_FORMAT: &str = "%Y_%m_%d_%H_%M_%S";

/// Identity of one orchestrated run.
///
/// Two runs started within the same second share a stamp and collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIdentity {
    started_at: DateTime<Utc>,
    stamp: String,
}

impl RunIdentity {
    /// Capture the identity of a run starting now.
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Identity of a run started at `started_at`.
    pub fn at(started_at: DateTime<Utc>) -> Self {
        Self {
            stamp: started_at.format(STAMP_FORMAT).to_string(),
            started_at,
        }
    }

    /// The formatted stamp, e.g. `2026_10_18_09_30_00`.
    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    /// When the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

/// Remote paths of one run under the case root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    case_root: String,
    stamp: String,
}

impl RunLayout {
    /// Layout for `identity` under `case_root`.
    pub fn new(case_root: &str, identity: &RunIdentity) -> Self {
        Self {
            case_root: case_root.trim_end_matches('/').to_string(),
            stamp: identity.stamp().to_string(),
        }
    }

    /// Case root without trailing slash.
    pub fn case_root(&self) -> &str {
        &self.case_root
    }

    /// Run directory name (the stamp).
    pub fn run_name(&self) -> &str {
        &self.stamp
    }

    /// Remote run directory, with trailing slash.
    pub fn run_dir(&self) -> String {
        format!("{}/{}/", self.case_root, self.stamp)
    }

    /// File name of the archive.
    pub fn archive_name(&self) -> String {
        format!("{}.tar", self.stamp)
    }

    /// Remote path of the archive.
    pub fn archive_path(&self) -> String {
        format!("{}/{}", self.case_root, self.archive_name())
    }
}

/// One command-line flag for the load-generation tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Flag, e.g. `-t`.
    pub flag: String,
    /// Value; empty for bare flags.
    #[serde(default)]
    pub value: String,
}

impl Parameter {
    /// A flag with a value.
    pub fn new(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: value.into(),
        }
    }

    /// A bare flag.
    pub fn flag(flag: impl Into<String>) -> Self {
        Self::new(flag, "")
    }
}

/// Default non-GUI distributed invocation for `script_name` in the run directory.
///
/// Runs the plan on the remote peers, writes the sample log next to it and
/// generates the HTML dashboard into `report/`.
pub fn default_parameters(script_name: &str, layout: &RunLayout) -> Vec<Parameter> {
    let dir = layout.run_dir();
    vec![
        Parameter::flag("-n"),
        Parameter::new("-t", format!("{}{}", dir, script_name)),
        Parameter::flag("-r"),
        Parameter::new("-l", format!("{}{}.jtl", dir, script_name)),
        Parameter::flag("-e"),
        Parameter::new("-o", format!("{}report", dir)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn identity() -> RunIdentity {
        RunIdentity::at(Utc.with_ymd_and_hms(2026, 10, 18, 9, 5, 7).unwrap())
    }

    #[test]
    fn stamp_format() {
        assert_eq!(identity().stamp(), "2026_10_18_09_05_07");
    }

    #[test]
    fn same_second_collides() {
        assert_eq!(identity(), identity());
    }

    #[test]
    fn layout_paths() {
        let layout = RunLayout::new("/usr/local/JmeterTest/TestCase/", &identity());
        assert_eq!(
            layout.run_dir(),
            "/usr/local/JmeterTest/TestCase/2026_10_18_09_05_07/"
        );
        assert_eq!(layout.archive_name(), "2026_10_18_09_05_07.tar");
        assert_eq!(
            layout.archive_path(),
            "/usr/local/JmeterTest/TestCase/2026_10_18_09_05_07.tar"
        );
    }

    #[test]
    fn default_parameters_point_into_run_dir() {
        let layout = RunLayout::new("/cases", &identity());
        let params = default_parameters("plan.jmx", &layout);
        let flags: Vec<&str> = params.iter().map(|p| p.flag.as_str()).collect();
        assert_eq!(flags, vec!["-n", "-t", "-r", "-l", "-e", "-o"]);
        assert_eq!(params[1].value, "/cases/2026_10_18_09_05_07/plan.jmx");
        assert_eq!(params[3].value, "/cases/2026_10_18_09_05_07/plan.jmx.jtl");
        assert_eq!(params[5].value, "/cases/2026_10_18_09_05_07/report");
        assert!(params[0].value.is_empty());
    }
}
