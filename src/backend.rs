// src/backend.rs

use crate::config::Aria2Tuning;
use crate::models::Source;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An external program able to perform a torrent transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    #[serde(rename = "aria2c")]
    Aria2c,
    #[serde(rename = "transmission-cli")]
    TransmissionCli,
    #[serde(rename = "rtorrent")]
    Rtorrent,
}

impl ToolKind {
    /// Probe order.
    pub const PRIORITY: [ToolKind; 3] = [ToolKind::Aria2c, ToolKind::TransmissionCli, ToolKind::Rtorrent];

    pub fn program(self) -> &'static str {
        match self {
            ToolKind::Aria2c => "aria2c",
            ToolKind::TransmissionCli => "transmission-cli",
            ToolKind::Rtorrent => "rtorrent",
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.program())
    }
}

/// Resolves a program name to an executable on this host.
pub trait ToolProbe: Send + Sync {
    fn locate(&self, program: &str) -> Option<PathBuf>;
}

/// Searches a list of directories the way a shell searches `$PATH`.
#[derive(Debug, Clone)]
pub struct PathProbe {
    dirs: Vec<PathBuf>,
}

impl PathProbe {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    pub fn from_env() -> Self {
        let path = std::env::var_os("PATH").unwrap_or_else(OsString::new);
        Self::new(std::env::split_paths(&path).collect())
    }
}

impl ToolProbe for PathProbe {
    fn locate(&self, program: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|dir| dir.join(program))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}

/// A resolved program plus the arguments to run it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub tool: ToolKind,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
}

/// Availability of transfer tools and helpers on this host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentReport {
    pub aria2c: bool,
    pub transmission: bool,
    pub rtorrent: bool,
    pub wget: bool,
    pub curl: bool,
    pub has_any_downloader: bool,
    pub recommended_tool: Option<ToolKind>,
}

/// Stateless selector; safe to call repeatedly and from many tasks.
/// Picks the transfer tool for a job and builds its command line.
///
/// Tools are probed in priority order: aria2c, transmission-cli, rtorrent.
/// Finding none is a normal outcome, not an error.
#[derive(Clone)]
pub struct BackendSelector {
    probe: Arc<dyn ToolProbe>,
    aria2: Aria2Tuning,
}

impl BackendSelector {
    pub fn new(probe: Arc<dyn ToolProbe>, aria2: Aria2Tuning) -> Self {
        Self { probe, aria2 }
    }

    /// First available tool in priority order, with its executable path.
    pub fn first_available(&self) -> Option<(ToolKind, PathBuf)> {
        ToolKind::PRIORITY
            .iter()
            .find_map(|&tool| self.probe.locate(tool.program()).map(|path| (tool, path)))
    }

    pub fn select_invocation(&self, source: &Source, download_path: &Path) -> Option<Invocation> {
        let (tool, program) = self.first_available()?;
        let target = source.as_argument();
        let dir = download_path.to_string_lossy().into_owned();

        let args = match tool {
            ToolKind::Aria2c => vec![
                target,
                "--dir".to_string(),
                dir,
                format!("--seed-time={}", self.aria2.seed_time),
                format!("--max-upload-limit={}", self.aria2.max_upload_limit),
                format!("--bt-max-peers={}", self.aria2.bt_max_peers),
                format!("--summary-interval={}", self.aria2.summary_interval),
                "--enable-dht=true".to_string(),
                "--bt-enable-lpd=true".to_string(),
                "--enable-peer-exchange=true".to_string(),
                format!("--console-log-level={}", self.aria2.console_log_level),
            ],
            ToolKind::TransmissionCli => vec!["-w".to_string(), dir, target],
            ToolKind::Rtorrent => vec!["-d".to_string(), dir, target],
        };

        Some(Invocation {
            tool,
            program,
            args,
            working_dir: download_path.to_path_buf(),
        })
    }

    pub fn environment_check(&self) -> EnvironmentReport {
        let has = |program: &str| self.probe.locate(program).is_some();
        let aria2c = has(ToolKind::Aria2c.program());
        let transmission = has(ToolKind::TransmissionCli.program());
        let rtorrent = has(ToolKind::Rtorrent.program());
        let recommended_tool = [
            (ToolKind::Aria2c, aria2c),
            (ToolKind::TransmissionCli, transmission),
            (ToolKind::Rtorrent, rtorrent),
        ]
        .into_iter()
        .find_map(|(tool, present)| present.then_some(tool));

        EnvironmentReport {
            aria2c,
            transmission,
            rtorrent,
            wget: has("wget"),
            curl: has("curl"),
            has_any_downloader: recommended_tool.is_some(),
            recommended_tool,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct FakeProbe(HashSet<&'static str>);

    impl ToolProbe for FakeProbe {
        fn locate(&self, program: &str) -> Option<PathBuf> {
            self.0
                .contains(program)
                .then(|| PathBuf::from("/opt/bin").join(program))
        }
    }

    fn selector(tools: &[&'static str]) -> BackendSelector {
        let probe = FakeProbe(tools.iter().copied().collect());
        BackendSelector::new(Arc::new(probe), Aria2Tuning::default())
    }

    #[test]
    fn aria2c_wins_when_everything_is_installed() {
        let sel = selector(&["rtorrent", "transmission-cli", "aria2c"]);
        let inv = sel
            .select_invocation(&Source::Magnet("magnet:?xt=urn:btih:AAA".into()), Path::new("/dl"))
            .unwrap();
        assert_eq!(inv.tool, ToolKind::Aria2c);
        assert_eq!(inv.program, PathBuf::from("/opt/bin/aria2c"));
        assert_eq!(inv.args[0], "magnet:?xt=urn:btih:AAA");
        assert_eq!(&inv.args[1..3], &["--dir".to_string(), "/dl".to_string()]);
        assert!(inv.args.contains(&"--max-upload-limit=10K".to_string()));
        assert!(inv.args.contains(&"--bt-max-peers=50".to_string()));
        assert!(inv.args.contains(&"--enable-dht=true".to_string()));
        assert_eq!(inv.working_dir, PathBuf::from("/dl"));
    }

    #[test]
    fn fallbacks_use_minimal_flags() {
        let src = Source::TorrentFile(PathBuf::from("/t/x.torrent"));

        let inv = selector(&["transmission-cli", "rtorrent"])
            .select_invocation(&src, Path::new("/dl"))
            .unwrap();
        assert_eq!(inv.tool, ToolKind::TransmissionCli);
        assert_eq!(inv.args, vec!["-w", "/dl", "/t/x.torrent"]);

        let inv = selector(&["rtorrent"]).select_invocation(&src, Path::new("/dl")).unwrap();
        assert_eq!(inv.tool, ToolKind::Rtorrent);
        assert_eq!(inv.args, vec!["-d", "/dl", "/t/x.torrent"]);
    }

    #[test]
    fn no_tool_is_a_negative_result() {
        let sel = selector(&["curl"]);
        assert!(sel
            .select_invocation(&Source::Magnet("magnet:?x".into()), Path::new("/dl"))
            .is_none());

        let report = sel.environment_check();
        assert!(report.curl);
        assert!(!report.wget);
        assert!(!report.has_any_downloader);
        assert_eq!(report.recommended_tool, None);
    }

    #[test]
    fn report_recommends_highest_priority_tool() {
        let report = selector(&["rtorrent", "transmission-cli"]).environment_check();
        assert!(report.has_any_downloader);
        assert!(!report.aria2c);
        assert_eq!(report.recommended_tool, Some(ToolKind::TransmissionCli));
    }

    #[cfg(unix)]
    #[test]
    fn path_probe_requires_executable_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("rtorrent");
        std::fs::write(&plain, "").unwrap();
        let probe = PathProbe::new(vec![dir.path().to_path_buf()]);
        assert!(probe.locate("rtorrent").is_none());

        std::fs::set_permissions(&plain, std::fs::Permissions::from_mode(0o755)).unwrap();
        assert_eq!(probe.locate("rtorrent"), Some(plain));
        assert!(probe.locate("aria2c").is_none());
    }
}
