//! Publishes dotnet projects as self-contained or AOT-compiled bundles,
//! for the host or cross-compiled for Linux ARM targets.

pub mod builder;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod install;
pub mod logger;
pub mod probe;
pub mod toolchain;

pub use builder::{Builder, DefaultBuilder};
pub use config::{BuildMode, BuildOption, BuildPlatform, BuilderConfig};
pub use error::BuildError;
