use std::path::PathBuf;
use thiserror::Error;

/// Every way an invocation can go wrong. The builder turns these into
/// `[ERROR]` log lines and a failed result; nothing here is fatal on its own.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Missing .csproj file! {path} has no dotnet project!", path = .0.display())]
    MissingProjectDescriptor(PathBuf),

    #[error(
        "{0} runtime and sdk is missing! To install see https://learn.microsoft.com/en-us/dotnet/core/install/linux-ubuntu"
    )]
    MissingToolchain(String),

    #[error("failed to parse .csproj file! {0:#}")]
    DescriptorParseFailure(anyhow::Error),

    #[error("{0} is missing for cross compilation! Install {0}! Ubuntu: sudo apt install {0}")]
    MissingCrossCompiler(String),

    #[error("sysroot is missing for cross compilation! ({path})", path = .0.display())]
    MissingSysroot(PathBuf),

    #[error("failed to create install directory {path}: {1}", path = .0.display())]
    InstallDirCreationFailure(PathBuf, std::io::Error),

    #[error("failed to launch {0}: {1:#}")]
    ToolchainLaunchFailure(String, anyhow::Error),

    #[error("build failed! ({0} exited with {1})")]
    ToolchainExitFailure(String, i32),

    #[error("failed to install into {path}: {1:#}", path = .0.display())]
    InstallCopyFailure(PathBuf, anyhow::Error),

    #[error("failed to clean project! {0}")]
    CleanFailure(std::io::Error),

    #[error("unrecognized option: '{0}'")]
    UnrecognizedOption(String),

    #[error("builder is not usable, see errors above")]
    InvalidBuilder,
}
