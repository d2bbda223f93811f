use crate::config::{BuildMode, BuildOption, BuildPlatform, BuilderConfig};
use crate::descriptor;
use crate::error::BuildError;
use crate::install;
use crate::logger::Logger;
use crate::toolchain::{self, ArtifactScanner, Environment, PublishCommand, SystemEnvironment};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Directories removed by `clean`, relative to the project root.
pub const CLEAN_DIRECTORIES: &[&str] = &["bin", "obj"];

pub struct Builder<E: Environment = SystemEnvironment>
{
    env: E,
    config: BuilderConfig,
    project_name: String,
    project_file: PathBuf,
    toolchain_version: String,
    major_version: String,
    publish_dir: Option<PathBuf>,
    is_valid: bool,
    logger: Logger,
}

pub trait DefaultBuilder
{
    fn build(&mut self, mode: BuildMode, platform: BuildPlatform) -> bool;
    fn clean(&mut self) -> bool;
    fn run(&mut self, option: BuildOption) -> bool;
    fn is_valid(&self) -> bool;
    fn log(&mut self);
}

impl Builder<SystemEnvironment> {
    pub fn from_system(config: BuilderConfig) -> Self {
        Self::new(config, SystemEnvironment)
    }
}

impl<E: Environment> Builder<E> {
    /// Validates the project and patches its descriptor. Check
    /// [`DefaultBuilder::is_valid`] before running anything.
    pub fn new(config: BuilderConfig, env: E) -> Self {
        let project_name = descriptor::project_name(&config.root);
        let project_file = descriptor::descriptor_path(&config.root);
        let mut builder = Self {
            env,
            config,
            project_name,
            project_file,
            toolchain_version: String::new(),
            major_version: String::new(),
            publish_dir: None,
            is_valid: false,
            logger: Logger::new(),
        };

        builder
            .logger
            .log_info(format!("builder version is {}", env!("CARGO_PKG_VERSION")));

        match builder.prepare() {
            Ok(()) => builder.is_valid = true,
            Err(e) => builder.logger.log_error(e.to_string()),
        }
        builder
    }

    fn prepare(&mut self) -> Result<(), BuildError> {
        if !self.project_file.is_file() {
            return Err(BuildError::MissingProjectDescriptor(self.config.root.clone()));
        }

        if !self.env.has_program(&self.config.toolchain) {
            return Err(BuildError::MissingToolchain(self.config.toolchain.clone()));
        }

        self.discover_version();

        let patched = descriptor::patch_file(&self.project_file, self.config.native)
            .map_err(BuildError::DescriptorParseFailure)?;
        if !patched {
            self.logger
                .log_error("invalid .csproj file! missing PropertyGroup");
        }

        if let Some(dir) = &self.config.install_dir {
            if !dir.is_dir() {
                fs::create_dir_all(dir)
                    .map_err(|e| BuildError::InstallDirCreationFailure(dir.clone(), e))?;
                self.logger
                    .log_info(format!("created install directory {}", dir.display()));
            }
        }

        Ok(())
    }

    fn discover_version(&mut self) {
        let Some(version) = self.env.toolchain_version(&self.config.toolchain) else {
            self.logger.log_warn(format!(
                "could not query {} version",
                self.config.toolchain
            ));
            return;
        };

        self.toolchain_version = version;
        match toolchain::major_minor(&self.toolchain_version) {
            Some(major) => {
                self.logger.log_info(format!(
                    "{} version is net{} -> ({})",
                    self.config.toolchain, major, self.toolchain_version
                ));
                self.major_version = major;
            }
            None => self.logger.log_warn(format!(
                "unexpected {} version '{}'",
                self.config.toolchain, self.toolchain_version
            )),
        }
    }

    fn try_build(&mut self, mode: BuildMode, platform: BuildPlatform) -> Result<(), BuildError> {
        if !self.is_valid {
            return Err(BuildError::InvalidBuilder);
        }

        let mut command = PublishCommand::new(&self.config.toolchain, &self.major_version, mode);
        if platform.is_cross() {
            if !self.env.has_program(&self.config.cross_compiler) {
                return Err(BuildError::MissingCrossCompiler(self.config.cross_compiler.clone()));
            }
            if self.config.native {
                let sysroot = self.config.sysroot.clone().unwrap_or_default();
                if !sysroot.is_dir() {
                    return Err(BuildError::MissingSysroot(sysroot));
                }
                command = command
                    .runtime(platform)
                    .native_cross(&self.config.cross_compiler, &sysroot);
            }
        }

        let mut scanner = ArtifactScanner::new(&self.project_name)
            .map_err(|e| BuildError::ToolchainLaunchFailure(self.config.toolchain.clone(), e))?;

        self.logger.log_info(format!("building {}", self.project_name));
        self.logger.log_info(format!("executing: {}", command));
        self.logger.flush();

        let code = self
            .env
            .run_streaming(command.args(), &self.config.root, &mut |line: &str| {
                println!("{}", line);
                scanner.scan(line);
            })
            .map_err(|e| BuildError::ToolchainLaunchFailure(self.config.toolchain.clone(), e))?;

        self.publish_dir = scanner.into_found();
        if code != 0 {
            return Err(BuildError::ToolchainExitFailure(self.config.toolchain.clone(), code));
        }

        if let Some(dir) = &self.publish_dir {
            self.logger.log_info(format!("published to {}", dir.display()));
        }
        self.install();
        Ok(())
    }

    /// Best effort: a failed copy is logged but the build still counts as good.
    fn install(&mut self) {
        let Some(install_dir) = self.config.install_dir.clone() else {
            return;
        };
        let Some(publish_dir) = self.publish_dir.clone() else {
            self.logger
                .log_warn("no publish directory in toolchain output, nothing to install");
            return;
        };

        match install::copy_tree(&publish_dir, &install_dir) {
            Ok(count) => self.logger.log_info(format!(
                "installed {} entries to {}",
                count,
                install_dir.display()
            )),
            Err(e) => self
                .logger
                .log_error(BuildError::InstallCopyFailure(install_dir, e).to_string()),
        }
    }

    fn try_clean(&mut self) -> Result<(), BuildError> {
        if !self.is_valid {
            return Err(BuildError::InvalidBuilder);
        }

        for dir in CLEAN_DIRECTORIES {
            let path = self.config.root.join(dir);
            match fs::remove_dir_all(&path) {
                Ok(()) => log::debug!("removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::CleanFailure(e)),
            }
        }
        self.logger.log_info("clean was successful");
        Ok(())
    }
}

#[cfg(test)]
impl<E: Environment> Builder<E> {
    pub fn toolchain_version(&self) -> &str {
        &self.toolchain_version
    }

    pub fn major_version(&self) -> &str {
        &self.major_version
    }

    pub fn publish_dir(&self) -> Option<&std::path::Path> {
        self.publish_dir.as_deref()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn environment(&self) -> &E {
        &self.env
    }
}

impl<E: Environment> DefaultBuilder for Builder<E>
{
    fn build(&mut self, mode: BuildMode, platform: BuildPlatform) -> bool {
        match self.try_build(mode, platform) {
            Ok(()) => true,
            Err(e) => {
                self.logger.log_error(e.to_string());
                false
            }
        }
    }

    fn clean(&mut self) -> bool {
        match self.try_clean() {
            Ok(()) => true,
            Err(e) => {
                self.logger.log_error(e.to_string());
                false
            }
        }
    }

    fn run(&mut self, option: BuildOption) -> bool {
        match option {
            BuildOption::Build(mode, platform) => self.build(mode, platform),
            BuildOption::Clean => self.clean(),
        }
    }

    fn is_valid(&self) -> bool {
        self.is_valid
    }

    fn log(&mut self) {
        self.logger.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::path::Path;
    use tempfile::TempDir;

    const EMPTY_GROUP: &str = "<Project Sdk=\"Microsoft.NET.Sdk\"><PropertyGroup></PropertyGroup></Project>";

    #[derive(Default)]
    struct FakeEnvironment {
        programs: Vec<&'static str>,
        version: Option<&'static str>,
        output: Vec<String>,
        exit_code: i32,
        launched: RefCell<Vec<(Vec<String>, PathBuf)>>,
    }

    impl FakeEnvironment {
        fn with_dotnet() -> Self {
            Self {
                programs: vec!["dotnet"],
                version: Some("8.0.100"),
                ..Default::default()
            }
        }

        fn launches(&self) -> usize {
            self.launched.borrow().len()
        }
    }

    impl Environment for FakeEnvironment {
        fn has_program(&self, program: &str) -> bool {
            self.programs.iter().any(|p| *p == program)
        }

        fn toolchain_version(&self, _toolchain: &str) -> Option<String> {
            self.version.map(str::to_string)
        }

        fn run_streaming(
            &self,
            command: &[String],
            cwd: &Path,
            on_line: &mut dyn FnMut(&str),
        ) -> anyhow::Result<i32> {
            self.launched
                .borrow_mut()
                .push((command.to_vec(), cwd.to_path_buf()));
            for line in &self.output {
                on_line(line);
            }
            Ok(self.exit_code)
        }
    }

    fn create_project(descriptor: Option<&str>) -> (TempDir, PathBuf) {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path().join("App");
        fs::create_dir(&root).unwrap();
        if let Some(contents) = descriptor {
            fs::write(root.join("App.csproj"), contents).unwrap();
        }
        (dir, root)
    }

    fn flags(root: &Path) -> (Option<String>, Option<String>) {
        let tree = descriptor::load(&root.join("App.csproj")).unwrap();
        (
            descriptor::flag_value(&tree, descriptor::PUBLISH_AOT),
            descriptor::flag_value(&tree, descriptor::INVARIANT_GLOBALIZATION),
        )
    }

    #[test]
    fn debug_build_scenario() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let mut builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(builder.is_valid());
        assert_eq!(builder.major_version(), "8.0");
        assert_eq!(builder.toolchain_version(), "8.0.100");
        assert_eq!(flags(&root), (Some("false".into()), Some("false".into())));

        assert!(builder.build(BuildMode::Debug, BuildPlatform::Host));

        let launched = builder.environment().launched.borrow();
        assert_eq!(launched.len(), 1);
        assert_eq!(
            launched[0].0,
            ["dotnet", "publish", "-f", "net8.0", "--self-contained", "true", "-c", "Debug"]
        );
        assert_eq!(launched[0].1, root);
    }

    #[test]
    fn native_flag_sets_descriptor_true() {
        let (_dir, root) = create_project(Some(
            "<Project><PropertyGroup><PublishAot>false</PublishAot></PropertyGroup></Project>",
        ));
        let mut config = BuilderConfig::new(&root);
        config.native = true;

        let builder = Builder::new(config, FakeEnvironment::with_dotnet());

        assert!(builder.is_valid());
        assert_eq!(flags(&root), (Some("true".into()), Some("true".into())));
    }

    #[test]
    fn missing_descriptor_makes_builder_invalid() {
        let (_dir, root) = create_project(None);
        fs::create_dir(root.join("bin")).unwrap();
        let mut builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(!builder.is_valid());
        assert!(builder.logger().contents().contains("Missing .csproj file!"));
        assert!(!builder.build(BuildMode::Release, BuildPlatform::Host));
        assert!(!builder.clean());
        assert!(root.join("bin").exists());
        assert_eq!(builder.environment().launches(), 0);
    }

    #[test]
    fn missing_toolchain_makes_builder_invalid() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::default());

        assert!(!builder.is_valid());
        assert!(builder.logger().contents().contains("dotnet runtime and sdk is missing!"));
        assert_eq!(fs::read_to_string(root.join("App.csproj")).unwrap(), EMPTY_GROUP);
    }

    #[test]
    fn malformed_descriptor_makes_builder_invalid() {
        let (_dir, root) = create_project(Some("<Project><PropertyGroup>"));
        let builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(!builder.is_valid());
        assert!(builder.logger().contents().contains("failed to parse .csproj file!"));
    }

    #[test]
    fn missing_property_group_is_logged_but_valid() {
        let (_dir, root) = create_project(Some("<Project><ItemGroup /></Project>"));
        let builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(builder.is_valid());
        assert!(builder
            .logger()
            .contents()
            .contains("[ERROR]: invalid .csproj file! missing PropertyGroup"));
    }

    #[test]
    fn unknown_version_leaves_framework_empty() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let env = FakeEnvironment {
            version: None,
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(BuilderConfig::new(&root), env);

        assert!(builder.is_valid());
        assert!(builder.build(BuildMode::Release, BuildPlatform::Host));
        assert_eq!(builder.environment().launched.borrow()[0].0[3], "net");
    }

    #[test]
    fn cross_build_without_compiler_launches_nothing() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let mut builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(!builder.build(BuildMode::Release, BuildPlatform::Arm64));
        assert!(builder.logger().contents().contains("clang is missing for cross compilation!"));
        assert_eq!(builder.environment().launches(), 0);
    }

    #[test]
    fn native_cross_build_without_sysroot_launches_nothing() {
        let (dir, root) = create_project(Some(EMPTY_GROUP));
        let mut config = BuilderConfig::new(&root);
        config.native = true;
        config.sysroot = Some(dir.path().join("no-sysroot"));
        let env = FakeEnvironment {
            programs: vec!["dotnet", "clang"],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(config, env);

        assert!(!builder.build(BuildMode::Debug, BuildPlatform::Arm));
        assert!(builder.logger().contents().contains("sysroot is missing"));
        assert_eq!(builder.environment().launches(), 0);
    }

    #[test]
    fn native_cross_build_passes_sysroot() {
        let (dir, root) = create_project(Some(EMPTY_GROUP));
        let sysroot = dir.path().join("sysroot");
        fs::create_dir(&sysroot).unwrap();
        let mut config = BuilderConfig::new(&root);
        config.native = true;
        config.sysroot = Some(sysroot.clone());
        let env = FakeEnvironment {
            programs: vec!["dotnet", "clang"],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(config, env);

        assert!(builder.build(BuildMode::Release, BuildPlatform::Arm64));

        let launched = builder.environment().launched.borrow();
        let args = &launched[0].0;
        assert_eq!(args[6..8], ["-c", "Release"]);
        assert_eq!(
            args[8..],
            [
                "-r".to_string(),
                "linux-arm64".to_string(),
                "-p:CppCompilerAndLinker=clang".to_string(),
                format!("-p:SysRoot={}", sysroot.display()),
            ]
        );
    }

    #[test]
    fn managed_cross_build_adds_no_cross_arguments() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let env = FakeEnvironment {
            programs: vec!["dotnet", "clang"],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(BuilderConfig::new(&root), env);

        assert!(builder.build(BuildMode::Debug, BuildPlatform::Arm));
        let launched = builder.environment().launched.borrow();
        assert_eq!(launched[0].0.len(), 8);
        assert_eq!(launched[0].0[6..], ["-c", "Debug"]);
    }

    #[test]
    fn failing_toolchain_fails_build() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let env = FakeEnvironment {
            exit_code: 1,
            output: vec!["error CS1002: ; expected".to_string()],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(BuilderConfig::new(&root), env);

        assert!(!builder.build(BuildMode::Release, BuildPlatform::Host));
        assert!(builder.logger().contents().contains("[ERROR]: build failed!"));
    }

    #[test]
    fn captures_publish_dir_and_installs() {
        let (dir, root) = create_project(Some(EMPTY_GROUP));
        let publish = root.join("bin/Release/net8.0/linux-x64/publish");
        fs::create_dir_all(&publish).unwrap();
        fs::write(publish.join("App"), "elf").unwrap();
        let install_dir = dir.path().join("install/app");

        let mut config = BuilderConfig::new(&root);
        config.install_dir = Some(install_dir.clone());
        let env = FakeEnvironment {
            output: vec![
                "  Determining projects to restore...".to_string(),
                format!("  App -> {}/App.dll", publish.parent().unwrap().display()),
                format!("  App -> {}/", publish.display()),
            ],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(config, env);
        assert!(install_dir.is_dir());

        assert!(builder.build(BuildMode::Release, BuildPlatform::Host));
        assert_eq!(
            builder.publish_dir(),
            Some(PathBuf::from(format!("{}/", publish.display())).as_path())
        );
        assert_eq!(fs::read_to_string(install_dir.join("App")).unwrap(), "elf");
    }

    #[test]
    fn failed_install_keeps_build_successful() {
        let (dir, root) = create_project(Some(EMPTY_GROUP));
        let mut config = BuilderConfig::new(&root);
        config.install_dir = Some(dir.path().join("install"));
        let env = FakeEnvironment {
            output: vec!["  App -> /nonexistent/App/bin/Release/net8.0/publish/".to_string()],
            ..FakeEnvironment::with_dotnet()
        };
        let mut builder = Builder::new(config, env);

        assert!(builder.build(BuildMode::Release, BuildPlatform::Host));
        assert!(builder.logger().contents().contains("failed to install into"));
    }

    #[test]
    fn clean_removes_bin_and_obj() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        fs::create_dir_all(root.join("bin/Debug")).unwrap();
        fs::create_dir_all(root.join("obj")).unwrap();
        fs::write(root.join("obj/project.assets.json"), "{}").unwrap();
        fs::write(root.join("Program.cs"), "").unwrap();

        let mut builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(builder.run(BuildOption::Clean));
        assert!(!root.join("bin").exists());
        assert!(!root.join("obj").exists());
        assert!(root.join("Program.cs").exists());
        assert!(builder.logger().contents().contains("clean was successful"));
        assert_eq!(builder.environment().launches(), 0);
    }

    #[test]
    fn clean_succeeds_when_nothing_to_remove() {
        let (_dir, root) = create_project(Some(EMPTY_GROUP));
        let mut builder = Builder::new(BuilderConfig::new(&root), FakeEnvironment::with_dotnet());

        assert!(builder.clean());
    }
}
