//! Structured remote intent and its shell rendering.
//!
//! Role scripts are built as a [`ScriptIntent`] first and turned into shell
//! text by exactly one function, [`render_script`]. Nothing else in the
//! workspace concatenates command strings for the load-generation tool.

use fleet_types::Role;
use serde::{Deserialize, Serialize};

use crate::run::{Parameter, RunLayout};

/// Where and how the load-generation tool lives on a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProfile {
    /// Remote root holding the tool installation.
    pub root: String,
    /// Directory name of the installed tool under `root`.
    pub home_dir: String,
    /// Download URL of the tool archive.
    pub archive_url: String,
    /// JVM heap options written into the launcher.
    pub heap: String,
    /// Control port the agents listen on.
    pub control_port: u16,
    /// Local RMI port of the agents.
    pub rmi_local_port: u16,
}

impl Default for ToolProfile {
    fn default() -> Self {
        Self {
            root: "/usr/local/JmeterTest".to_string(),
            home_dir: "apache-jmeter".to_string(),
            archive_url:
                "https://archive.apache.org/dist/jmeter/binaries/apache-jmeter-5.2.tgz"
                    .to_string(),
            heap: "-Xms8g -Xmx8g -XX:MaxMetaspaceSize=256m".to_string(),
            control_port: 1099,
            rmi_local_port: 4000,
        }
    }
}

impl ToolProfile {
    /// Root without trailing slash.
    pub fn root(&self) -> &str {
        self.root.trim_end_matches('/')
    }

    /// Absolute path of the installed tool.
    pub fn install_path(&self) -> String {
        format!("{}/{}", self.root(), self.home_dir)
    }

    /// Absolute path of the tool's `bin` directory.
    pub fn bin_path(&self) -> String {
        format!("{}/bin", self.install_path())
    }

    /// File name of the downloaded archive.
    pub fn archive_file(&self) -> &str {
        self.archive_url
            .rsplit('/')
            .next()
            .unwrap_or(&self.archive_url)
    }

    /// Directory the archive unpacks into.
    pub fn unpacked_dir(&self) -> &str {
        let file = self.archive_file();
        file.strip_suffix(".tgz")
            .or_else(|| file.strip_suffix(".tar.gz"))
            .unwrap_or(file)
    }

    /// Install steps for this profile.
    pub fn install_steps(&self) -> InstallSteps {
        InstallSteps {
            url: self.archive_url.clone(),
            archive_file: self.archive_file().to_string(),
            unpacked_dir: self.unpacked_dir().to_string(),
            home_dir: self.home_dir.clone(),
        }
    }
}

/// Download-and-unpack of the tool into the profile root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSteps {
    /// Archive URL.
    pub url: String,
    /// Archive file name.
    pub archive_file: String,
    /// Directory the archive unpacks into.
    pub unpacked_dir: String,
    /// Final directory name.
    pub home_dir: String,
}

/// Set `key` to `value` in the tool's properties file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyEdit {
    /// Property key.
    pub key: String,
    /// New value.
    pub value: String,
}

impl PropertyEdit {
    /// Edit `key` to `value`.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Everything a host must do in one role, before rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptIntent {
    /// Role this intent configures.
    pub role: Role,
    /// Profile root, created and entered first.
    pub root: String,
    /// Install the tool before configuring it.
    pub install: Option<InstallSteps>,
    /// Directory entered before edits and invocation.
    pub bin_dir: Option<String>,
    /// Heap options written into the launcher.
    pub heap: Option<String>,
    /// Property edits in order.
    pub properties: Vec<PropertyEdit>,
    /// Remote agents the master drives. Always empty for slaves.
    pub peers: Vec<String>,
    /// Tool invocation. Master only.
    pub invocation: Option<Vec<Parameter>>,
    /// Background agent start. Slave only.
    pub start_agent: bool,
    /// Archive the run directory afterwards. Master only.
    pub archive: Option<RunLayout>,
}

/// Rendered shell text for one host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandScript {
    statements: Vec<String>,
}

impl CommandScript {
    /// Statements in execution order.
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// Whether any statement contains `needle`.
    pub fn contains(&self, needle: &str) -> bool {
        self.statements.iter().any(|s| s.contains(needle))
    }

    /// Newline-joined shell text.
    pub fn render(&self) -> String {
        let mut out = self.statements.join("\n");
        out.push('\n');
        out
    }
}

impl std::fmt::Display for CommandScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.render())
    }
}

const PROPERTIES_FILE: &str = "jmeter.properties";
const LAUNCHER: &str = "jmeter";
const AGENT: &str = "jmeter-server";

/// Properties both roles share.
/// Flags that send the plan to remote agents.
const REMOTE_FLAGS: [&str; 2] = ["-r", "-R"];

fn common_properties() -> Vec<PropertyEdit> {
    vec![
        PropertyEdit::new("tcp.charset", "UTF-8"),
        PropertyEdit::new("server.rmi.ssl.disable", "true"),
    ]
}

/// Master intent: configure, run against `peers`, archive the run directory.
///
/// With no peers the remote-run flags are dropped and the plan runs locally.
pub fn master_intent(
    profile: &ToolProfile,
    install: bool,
    peers: Vec<String>,
    mut parameters: Vec<Parameter>,
    layout: &RunLayout,
) -> ScriptIntent {
    if peers.is_empty() {
        parameters.retain(|p| !REMOTE_FLAGS.contains(&p.flag.as_str()));
    }
    let mut properties = common_properties();
    properties.push(PropertyEdit::new("remote_hosts", peers.join(",")));
    ScriptIntent {
        role: Role::Master,
        root: profile.root().to_string(),
        install: install.then(|| profile.install_steps()),
        bin_dir: Some(profile.bin_path()),
        heap: Some(profile.heap.clone()),
        properties,
        peers,
        invocation: Some(parameters),
        start_agent: false,
        archive: Some(layout.clone()),
    }
}

/// Slave intent: configure the agent ports. The agent starts separately.
pub fn slave_intent(profile: &ToolProfile, install: bool) -> ScriptIntent {
    let mut properties = vec![
        PropertyEdit::new("server_port", profile.control_port.to_string()),
        PropertyEdit::new("server.rmi.localport", profile.rmi_local_port.to_string()),
    ];
    properties.extend(common_properties());
    ScriptIntent {
        role: Role::Slave,
        root: profile.root().to_string(),
        install: install.then(|| profile.install_steps()),
        bin_dir: Some(profile.bin_path()),
        heap: Some(profile.heap.clone()),
        properties,
        peers: Vec::new(),
        invocation: None,
        start_agent: false,
        archive: None,
    }
}

/// Intent that only starts the long-lived agent in the background.
pub fn agent_start_intent(profile: &ToolProfile) -> ScriptIntent {
    ScriptIntent {
        role: Role::Slave,
        root: profile.root().to_string(),
        install: None,
        bin_dir: Some(profile.bin_path()),
        heap: None,
        properties: Vec::new(),
        peers: Vec::new(),
        invocation: None,
        start_agent: true,
        archive: None,
    }
}

/// Render an intent into shell text.
///
/// Every script starts with `set -e` so the first failing statement sets the
/// exit status. Slaves never get a peer list; masters never get agent ports.
pub fn render_script(intent: &ScriptIntent) -> CommandScript {
    let mut s = vec!["set -e".to_string()];

    s.push(format!("mkdir -p {}", shell_quote(&intent.root)));
    s.push(format!("cd {}", shell_quote(&intent.root)));

    if let Some(install) = &intent.install {
        s.push(format!("wget -q -N {}", shell_quote(&install.url)));
        s.push(format!("tar -xf {}", shell_quote(&install.archive_file)));
        s.push(format!("rm -rf {}", shell_quote(&install.home_dir)));
        s.push(format!(
            "mv {} {}",
            shell_quote(&install.unpacked_dir),
            shell_quote(&install.home_dir)
        ));
    }

    if let Some(bin) = &intent.bin_dir {
        s.push(format!("cd {}", shell_quote(bin)));
    }

    if let Some(heap) = &intent.heap {
        s.push(format!(
            "sed -i 's/HEAP:=\"[^\"]*\"/HEAP:=\"{}\"/' {}",
            sed_replacement(heap),
            LAUNCHER
        ));
    }

    for edit in &intent.properties {
        if intent.role == Role::Slave && edit.key == "remote_hosts" {
            continue;
        }
        s.push(format!(
            "sed -i 's/^#*{}=.*/{}={}/' {}",
            bre_escape(&edit.key),
            sed_replacement(&edit.key),
            sed_replacement(&edit.value),
            PROPERTIES_FILE
        ));
    }

    if intent.start_agent {
        s.push(format!("nohup ./{} > {}.out 2>&1 &", AGENT, AGENT));
    }

    if let Some(params) = &intent.invocation {
        let mut line = format!("./{}", LAUNCHER);
        for p in params {
            line.push(' ');
            line.push_str(&p.flag);
            if !p.value.is_empty() {
                line.push(' ');
                line.push_str(&shell_quote(&p.value));
            }
        }
        s.push(line);
    }

    if let Some(layout) = &intent.archive {
        s.push(format!("cd {}", shell_quote(layout.case_root())));
        s.push(format!(
            "tar -cf {} {}",
            shell_quote(&layout.archive_name()),
            shell_quote(layout.run_name())
        ));
    }

    CommandScript { statements: s }
}

/// Create a remote directory tree.
pub fn mkdir_script(path: &str) -> CommandScript {
    CommandScript {
        statements: vec![format!("mkdir -p -v {}", shell_quote(path))],
    }
}

/// Pack `dir` into `<dir>.tar` next to it.
pub fn archive_directory_script(dir: &str) -> CommandScript {
    let trimmed = dir.trim_end_matches('/');
    let (parent, name) = match trimmed.rsplit_once('/') {
        Some(("", name)) => ("/", name),
        Some((parent, name)) => (parent, name),
        None => (".", trimmed),
    };
    CommandScript {
        statements: vec![
            "set -e".to_string(),
            format!("cd {}", shell_quote(parent)),
            format!("tar -cf {}.tar {}", shell_quote(name), shell_quote(name)),
        ],
    }
}

/// Single-quote `value` unless it is made of plainly safe characters.
fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', "'\\''"))
    }
}

/// Escape a literal for a basic regular expression inside `s/.../`.
fn bre_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '.' | '[' | ']' | '*' | '^' | '$' | '\\' | '/') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a literal for the replacement side of `s/.../.../`.
fn sed_replacement(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' | '/' | '&' => {
                out.push('\\');
                out.push(c);
            }
            '\'' => out.push_str("'\\''"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{default_parameters, RunIdentity};
    use chrono::{TimeZone, Utc};

    fn layout() -> RunLayout {
        let id = RunIdentity::at(Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap());
        RunLayout::new("/usr/local/JmeterTest/TestCase", &id)
    }

    fn master(install: bool) -> CommandScript {
        let profile = ToolProfile::default();
        let peers = vec!["10.0.0.2:1099".to_string(), "10.0.0.3:1099".to_string()];
        let params = default_parameters("plan.jmx", &layout());
        render_script(&master_intent(&profile, install, peers, params, &layout()))
    }

    fn slave(install: bool) -> CommandScript {
        render_script(&slave_intent(&ToolProfile::default(), install))
    }

    // ===========================================
    // Role disjointness
    // ===========================================

    #[test]
    fn master_has_no_agent_ports() {
        let script = master(true);
        assert!(!script.contains("server_port"));
        assert!(!script.contains("server\\.rmi\\.localport"));
        assert!(!script.contains("jmeter-server"));
    }

    #[test]
    fn slave_has_no_peer_list() {
        let script = slave(true);
        assert!(!script.contains("remote_hosts"));
        assert!(!script.contains("./jmeter "));
        assert!(script.contains("server_port=1099"));
        assert!(script.contains("localport=4000"));
    }

    #[test]
    fn slave_filter_drops_injected_peer_list() {
        let mut intent = slave_intent(&ToolProfile::default(), false);
        intent
            .properties
            .push(PropertyEdit::new("remote_hosts", "10.0.0.9:1099"));
        assert!(!render_script(&intent).contains("remote_hosts"));
    }

    // ===========================================
    // Master rendering
    // ===========================================

    #[test]
    fn master_peer_list_and_invocation() {
        let script = master(false);
        assert!(script.contains("remote_hosts=10.0.0.2:1099,10.0.0.3:1099"));
        assert!(script.contains(
            "./jmeter -n -t /usr/local/JmeterTest/TestCase/2026_10_18_09_00_00/plan.jmx -r"
        ));
        assert!(script.contains("-o /usr/local/JmeterTest/TestCase/2026_10_18_09_00_00/report"));
    }

    #[test]
    fn master_without_peers_runs_locally() {
        let params = default_parameters("plan.jmx", &layout());
        let intent = master_intent(&ToolProfile::default(), false, Vec::new(), params, &layout());
        let script = render_script(&intent);

        assert!(script.contains("remote_hosts="));
        let invocation = script
            .statements()
            .iter()
            .find(|s| s.starts_with("./jmeter -n"))
            .unwrap();
        assert!(!invocation.contains(" -r"));
        assert!(invocation.contains("-l /usr/local/JmeterTest/TestCase/2026_10_18_09_00_00/plan.jmx.jtl"));
    }

    #[test]
    fn master_ends_with_archive() {
        let script = master(false);
        let last = script.statements().last().unwrap();
        assert_eq!(last, "tar -cf 2026_10_18_09_00_00.tar 2026_10_18_09_00_00");
        let before = &script.statements()[script.statements().len() - 2];
        assert_eq!(before, "cd /usr/local/JmeterTest/TestCase");
    }

    #[test]
    fn scripts_fail_fast() {
        assert_eq!(master(false).statements()[0], "set -e");
        assert_eq!(slave(false).statements()[0], "set -e");
    }

    // ===========================================
    // Install and heap
    // ===========================================

    #[test]
    fn install_only_when_requested() {
        assert!(master(true).contains("wget -q -N https://archive.apache.org"));
        assert!(master(true).contains("mv apache-jmeter-5.2 apache-jmeter"));
        assert!(!master(false).contains("wget"));
        assert!(!slave(false).contains("tar -xf"));
    }

    #[test]
    fn heap_rewritten_in_launcher() {
        let script = slave(false);
        assert!(script.contains("-Xms8g -Xmx8g"));
        assert!(script.contains("' jmeter"));
    }

    #[test]
    fn agent_start_runs_in_background() {
        let script = render_script(&agent_start_intent(&ToolProfile::default()));
        assert!(script.contains("cd /usr/local/JmeterTest/apache-jmeter/bin"));
        assert!(script.contains("nohup ./jmeter-server"));
        assert!(script.statements().last().unwrap().ends_with('&'));
        assert!(!script.contains("sed"));
    }

    // ===========================================
    // Helpers
    // ===========================================

    #[test]
    fn profile_paths() {
        let profile = ToolProfile {
            root: "/opt/tool/".to_string(),
            ..ToolProfile::default()
        };
        assert_eq!(profile.install_path(), "/opt/tool/apache-jmeter");
        assert_eq!(profile.archive_file(), "apache-jmeter-5.2.tgz");
        assert_eq!(profile.unpacked_dir(), "apache-jmeter-5.2");
    }

    #[test]
    fn mkdir_and_archive() {
        assert_eq!(
            mkdir_script("/cases/run/").render(),
            "mkdir -p -v /cases/run/\n"
        );
        let archive = archive_directory_script("/cases/run/");
        assert_eq!(archive.statements()[1], "cd /cases");
        assert_eq!(archive.statements()[2], "tar -cf run.tar run");
        assert_eq!(archive_directory_script("/data").statements()[1], "cd /");
    }

    #[test]
    fn quoting() {
        assert_eq!(shell_quote("/plain/path.jmx"), "/plain/path.jmx");
        assert_eq!(shell_quote("has space"), "'has space'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(bre_escape("a.b"), "a\\.b");
        assert_eq!(sed_replacement("a/b&c"), "a\\/b\\&c");
    }
}
