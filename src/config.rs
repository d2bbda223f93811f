use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::BuildError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    Debug,
    Release,
}

impl BuildMode {
    /// Configuration name passed to the toolchain with `-c`.
    pub fn name(self) -> &'static str {
        match self {
            BuildMode::Debug => "Debug",
            BuildMode::Release => "Release",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildPlatform {
    Host,
    X86_64,
    Arm64,
    Arm,
}

impl BuildPlatform {
    /// Runtime identifier passed to the toolchain with `-r`.
    pub fn runtime_id(self) -> &'static str {
        match self {
            BuildPlatform::Host => "host",
            BuildPlatform::X86_64 => "linux-x64",
            BuildPlatform::Arm64 => "linux-arm64",
            BuildPlatform::Arm => "linux-arm",
        }
    }

    pub fn is_cross(self) -> bool {
        self != BuildPlatform::Host
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOption {
    Build(BuildMode, BuildPlatform),
    Clean,
}

/// Every token accepted as `<BUILD_OPTION>`, in the order shown by `--help`.
pub const BUILD_OPTIONS: &[(&str, BuildOption)] = &[
    ("release", BuildOption::Build(BuildMode::Release, BuildPlatform::Host)),
    ("debug", BuildOption::Build(BuildMode::Debug, BuildPlatform::Host)),
    ("clean", BuildOption::Clean),
    ("release:arm64", BuildOption::Build(BuildMode::Release, BuildPlatform::Arm64)),
    ("debug:arm64", BuildOption::Build(BuildMode::Debug, BuildPlatform::Arm64)),
    ("release:arm", BuildOption::Build(BuildMode::Release, BuildPlatform::Arm)),
    ("debug:arm", BuildOption::Build(BuildMode::Debug, BuildPlatform::Arm)),
];

impl FromStr for BuildOption {
    type Err = BuildError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        BUILD_OPTIONS
            .iter()
            .find(|(key, _)| *key == token)
            .map(|(_, option)| *option)
            .ok_or_else(|| BuildError::UnrecognizedOption(token.to_string()))
    }
}

impl fmt::Display for BuildOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match BUILD_OPTIONS.iter().find(|(_, option)| option == self) {
            Some((key, _)) => f.write_str(key),
            None => match self {
                BuildOption::Build(mode, platform) => {
                    write!(f, "{}:{}", mode.name().to_lowercase(), platform.runtime_id())
                }
                BuildOption::Clean => f.write_str("clean"),
            },
        }
    }
}

/// Optional defaults read from `--config`. Command-line flags win.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct BuildConfig {
    pub toolchain: Option<String>,
    pub cross_compiler: Option<String>,
    pub native: Option<bool>,
    pub sysroot: Option<String>,
    pub install: Option<String>,
}

/// Everything the builder needs to know about one invocation.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    pub root: PathBuf,
    pub toolchain: String,
    pub cross_compiler: String,
    pub native: bool,
    pub sysroot: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
}

impl BuilderConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            toolchain: "dotnet".to_string(),
            cross_compiler: "clang".to_string(),
            native: false,
            sysroot: None,
            install_dir: None,
        }
    }

    /// Fill in anything the command line left unset from a config file.
    pub fn merge_file(mut self, file: &BuildConfig) -> Self {
        if let Some(toolchain) = &file.toolchain {
            self.toolchain = toolchain.clone();
        }
        if let Some(cross) = &file.cross_compiler {
            self.cross_compiler = cross.clone();
        }
        if let Some(true) = file.native {
            self.native = true;
        }
        if self.sysroot.is_none() {
            self.sysroot = file.sysroot.as_ref().map(PathBuf::from);
        }
        if self.install_dir.is_none() {
            self.install_dir = file.install.as_ref().map(PathBuf::from);
        }
        self
    }
}

pub fn load_config(path: &str) -> anyhow::Result<BuildConfig>
{
    let content = std::fs::read_to_string(path)?;

    if path.ends_with(".toml") {
        Ok(toml::from_str(&content)?)
    } else if path.ends_with(".yaml") || path.ends_with(".yml") {
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Err(anyhow::anyhow!("Unsupported config file format!"))
    }
}
