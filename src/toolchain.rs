//! Everything that talks to the external toolchain: version discovery,
//! publish command lines, and scanning its output for the artifact path.

use anyhow::{Context, Result};
use regex::Regex;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::{BuildMode, BuildPlatform};
use crate::probe;

/// The outside world as the builder sees it.
///
/// `SystemEnvironment` is the real thing; tests swap in canned answers.
pub trait Environment {
    fn has_program(&self, program: &str) -> bool;

    /// Trimmed stdout of `<toolchain> --version`, `None` if it failed.
    fn toolchain_version(&self, toolchain: &str) -> Option<String>;

    /// Run `command` in `cwd`, handing every stdout line to `on_line`.
    /// Returns the exit code.
    fn run_streaming(
        &self,
        command: &[String],
        cwd: &Path,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32>;
}

pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn has_program(&self, program: &str) -> bool {
        probe::system_has(program)
    }

    fn toolchain_version(&self, toolchain: &str) -> Option<String> {
        match Command::new(toolchain).arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
                Some(version).filter(|v| !v.is_empty())
            }
            Ok(output) => {
                log::debug!("{} --version exited with {:?}", toolchain, output.status.code());
                None
            }
            Err(e) => {
                log::debug!("failed to run {} --version: {}", toolchain, e);
                None
            }
        }
    }

    fn run_streaming(
        &self,
        command: &[String],
        cwd: &Path,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<i32> {
        let (program, args) = command
            .split_first()
            .context("empty command line")?;

        let mut child = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| format!("cannot spawn {}", program))?;

        let streamed = match child.stdout.take() {
            Some(stdout) => stream_lines(stdout, on_line),
            None => Ok(()),
        };

        // Reap the child even when reading its output failed.
        let status = child.wait().context("cannot wait for toolchain")?;
        streamed?;
        // A signal-terminated child has no code; count it as a failure.
        Ok(status.code().unwrap_or(-1))
    }
}

/// Hand each line of `output` to `on_line` without its line ending.
/// Bytes that are not UTF-8 are replaced rather than rejected.
pub fn stream_lines<R: Read>(output: R, on_line: &mut dyn FnMut(&str)) -> Result<()> {
    let mut reader = BufReader::new(output);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .context("cannot read toolchain output")?;
        if read == 0 {
            return Ok(());
        }
        if buf.ends_with(b"\n") {
            buf.pop();
            if buf.ends_with(b"\r") {
                buf.pop();
            }
        }
        on_line(&String::from_utf8_lossy(&buf));
    }
}

/// `8.0.100` -> `8.0`. Needs at least three components.
pub fn major_minor(version: &str) -> Option<String> {
    let parts: Vec<&str> = version.trim().split('.').collect();
    if parts.len() > 2 {
        Some(format!("{}.{}", parts[0], parts[1]))
    } else {
        None
    }
}

/// Arguments for one `publish` invocation, program name first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishCommand {
    args: Vec<String>,
}

impl PublishCommand {
    pub fn new(toolchain: &str, framework: &str, mode: BuildMode) -> Self {
        let framework = format!("net{}", framework);
        let args = [
            toolchain,
            "publish",
            "-f",
            framework.as_str(),
            "--self-contained",
            "true",
            "-c",
            mode.name(),
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect();
        Self { args }
    }

    pub fn runtime(mut self, platform: BuildPlatform) -> Self {
        self.args.push("-r".to_string());
        self.args.push(platform.runtime_id().to_string());
        self
    }

    /// Properties for an AOT cross build.
    pub fn native_cross(mut self, compiler: &str, sysroot: &Path) -> Self {
        self.args.push(format!("-p:CppCompilerAndLinker={}", compiler));
        self.args.push(format!("-p:SysRoot={}", sysroot.display()));
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl std::fmt::Display for PublishCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

/// Picks the publish directory out of lines like `  App -> /path/publish/`.
#[derive(Debug)]
pub struct ArtifactScanner {
    pattern: Regex,
    found: Option<PathBuf>,
}

impl ArtifactScanner {
    pub fn new(project_name: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(
            r"\s{}\s->\s(.+publish/)",
            regex::escape(project_name)
        ))?;
        Ok(Self { pattern, found: None })
    }

    /// Returns the path when this line names one. Later matches replace earlier ones.
    pub fn scan(&mut self, line: &str) -> Option<&Path> {
        let captured = self.pattern.captures(line)?.get(1)?.as_str();
        self.found = Some(PathBuf::from(captured));
        self.found.as_deref()
    }

    pub fn into_found(self) -> Option<PathBuf> {
        self.found
    }
}
