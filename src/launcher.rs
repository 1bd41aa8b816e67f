//! Gesture actions: launch the primary application set, open the secondary URL.
//! Programs are spawned detached with null stdio; a missing program is logged
//! and skipped so one absent app does not cancel the rest of the set.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{is_valid_url, LauncherConfig};
use crate::error::DispatchError;

/// Action capability invoked by the controller on a recognized gesture.
pub trait ActionDispatcher {
    /// Double clap inside the activation window.
    fn launch_primary_set(&mut self) -> Result<(), DispatchError>;

    /// Triple clap inside the follow-up window.
    fn open_secondary_target(&mut self) -> Result<(), DispatchError>;
}

/// Host platform families with distinct launch conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => Platform::Linux,
            "macos" => Platform::MacOs,
            "windows" => Platform::Windows,
            _ => Platform::Other,
        }
    }
}

/// One program in the primary set, with an optional substitute tried when the
/// first command is not installed.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchStep {
    pub argv: Vec<String>,
    pub fallback: Option<Vec<String>>,
}

impl LaunchStep {
    fn new(argv: &[&str]) -> Self {
        Self {
            argv: argv.iter().map(|s| s.to_string()).collect(),
            fallback: None,
        }
    }

    fn or_else(mut self, argv: &[&str]) -> Self {
        self.fallback = Some(argv.iter().map(|s| s.to_string()).collect());
        self
    }
}

/// Default primary set per platform, checking optional programs against the
/// filesystem at call time.
pub fn primary_plan(platform: Platform, config: &LauncherConfig) -> Vec<LaunchStep> {
    primary_plan_with(platform, config, |p| p.exists())
}

/// [`primary_plan`] with an injectable existence check.
pub fn primary_plan_with(
    platform: Platform,
    config: &LauncherConfig,
    exists: impl Fn(&Path) -> bool,
) -> Vec<LaunchStep> {
    let url = config.primary_url.as_str();
    match platform {
        Platform::Linux => vec![
            LaunchStep::new(&["code"]),
            LaunchStep::new(&["google-chrome", url]).or_else(&["chromium-browser", url]),
            LaunchStep::new(&["discord"]),
        ],
        Platform::MacOs => {
            let project = expand_home(&config.project_dir);
            let editor = match project.as_deref() {
                Some(dir) if exists(dir) => {
                    let dir = dir.to_string_lossy();
                    LaunchStep::new(&["open", "-a", "Visual Studio Code", &*dir])
                }
                _ => {
                    warn!(dir = %config.project_dir, "project folder not found, opening VS Code alone");
                    LaunchStep::new(&["open", "-a", "Visual Studio Code"])
                }
            };
            vec![
                editor,
                LaunchStep::new(&["open", "-a", "Google Chrome", "--args", "--new-window", url]),
            ]
        }
        Platform::Windows => {
            let present = |path: &Option<String>, name: &str| match path {
                Some(p) if exists(Path::new(p)) => Some(p.clone()),
                _ => {
                    warn!(program = name, "path not configured or not found, skipped");
                    None
                }
            };
            let mut steps = vec![LaunchStep::new(&["cmd.exe", "/c", "start", "", config.vs_code_path.as_str()])];
            if let Some(spotify) = present(&config.spotify_path, "spotify") {
                steps.push(LaunchStep::new(&["cmd.exe", "/c", "start", "", spotify.as_str()]));
            }
            if let Some(brave) = present(&Some(config.brave_path.clone()), "brave") {
                steps.push(LaunchStep::new(&[
                    "cmd.exe",
                    "/c",
                    "start",
                    "",
                    brave.as_str(),
                    "--new-window",
                    "--profile-directory=Default",
                ]));
            }
            if let Some(discord) = present(&config.discord_path, "discord") {
                steps.push(LaunchStep::new(&[discord.as_str(), "--processStart", "Discord.exe"]));
            }
            steps
        }
        Platform::Other => Vec::new(),
    }
}

/// Resolve a leading `~/` against `$HOME` (`%USERPROFILE%` on Windows).
fn expand_home(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(|home| PathBuf::from(home).join(rest)),
        None => Some(PathBuf::from(path)),
    }
}

/// Command that opens `url` with the platform's default handler.
pub fn opener_command(platform: Platform, url: &str) -> Option<Vec<String>> {
    let argv = match platform {
        Platform::Linux => vec!["xdg-open", url],
        Platform::MacOs => vec!["open", url],
        Platform::Windows => vec!["cmd.exe", "/c", "start", "", url],
        Platform::Other => return None,
    };
    Some(argv.into_iter().map(String::from).collect())
}

/// Process-spawning dispatcher.
pub struct CommandLauncher {
    platform: Platform,
    config: LauncherConfig,
    spacing: Duration,
}

impl CommandLauncher {
    pub fn new(config: &LauncherConfig) -> Self {
        Self::for_platform(Platform::current(), config)
    }

    pub fn for_platform(platform: Platform, config: &LauncherConfig) -> Self {
        Self {
            platform,
            config: config.clone(),
            spacing: Duration::from_millis(config.launch_spacing_ms),
        }
    }

    /// Steps the next double clap would run. Configured commands replace the
    /// platform set; otherwise optional programs are re-checked on each call.
    pub fn primary_steps(&self) -> Vec<LaunchStep> {
        match &self.config.primary_commands {
            Some(commands) => commands
                .iter()
                .filter(|argv| !argv.is_empty())
                .map(|argv| LaunchStep {
                    argv: argv.clone(),
                    fallback: None,
                })
                .collect(),
            None => primary_plan(self.platform, &self.config),
        }
    }

    fn run_step(step: &LaunchStep) -> Result<(), DispatchError> {
        match spawn_detached(&step.argv) {
            Err(DispatchError::CommandNotFound(program)) => match &step.fallback {
                Some(fallback) => {
                    debug!(program = %program, "primary command missing, trying fallback");
                    spawn_detached(fallback)
                }
                None => Err(DispatchError::CommandNotFound(program)),
            },
            other => other,
        }
    }
}

impl ActionDispatcher for CommandLauncher {
    fn launch_primary_set(&mut self) -> Result<(), DispatchError> {
        let steps = self.primary_steps();
        if steps.is_empty() {
            return Err(DispatchError::Unsupported(std::env::consts::OS.to_string()));
        }
        info!(count = steps.len(), "launching primary set");

        let mut launched = 0usize;
        for (i, step) in steps.iter().enumerate() {
            if i > 0 && !self.spacing.is_zero() {
                std::thread::sleep(self.spacing);
            }
            match Self::run_step(step) {
                Ok(()) => launched += 1,
                Err(e) => warn!(error = %e, "launch step failed"),
            }
        }

        if launched == 0 {
            return Err(DispatchError::NothingLaunched);
        }
        info!(launched, "primary set launched");
        Ok(())
    }

    fn open_secondary_target(&mut self) -> Result<(), DispatchError> {
        let url = &self.config.secondary_url;
        if !is_valid_url(url) {
            return Err(DispatchError::InvalidUrl(url.clone()));
        }
        let argv = opener_command(self.platform, url)
            .ok_or_else(|| DispatchError::Unsupported(std::env::consts::OS.to_string()))?;
        spawn_detached(&argv)?;
        info!(url = %url, "secondary target opened");
        Ok(())
    }
}

/// Spawn `argv` with null stdio and reap it on a background thread.
fn spawn_detached(argv: &[String]) -> Result<(), DispatchError> {
    let (program, args) = argv
        .split_first()
        .ok_or(DispatchError::NothingLaunched)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => DispatchError::CommandNotFound(program.clone()),
            _ => DispatchError::Spawn {
                program: program.clone(),
                reason: e.to_string(),
            },
        })?;

    debug!(program = %program, pid = child.id(), "spawned");
    let name = program.clone();
    let reaper = std::thread::Builder::new()
        .name("launch-reaper".into())
        .spawn(move || {
            if let Err(e) = child.wait() {
                debug!(program = %name, error = %e, "wait failed");
            }
        });
    if let Err(e) = reaper {
        debug!(error = %e, "reaper thread not started");
    }
    Ok(())
}
