use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, UmbraError};

/// Sequence name the generated script converts and stacks.
pub const SEQUENCE_NAME: &str = "dark";
/// Stem of the intermediate output the engine leaves in the staging dir.
pub const RESULT_STEM: &str = "stack_result";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackMethod {
    #[default]
    Average,
    Median,
}

impl std::fmt::Display for StackMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StackMethod::Average => write!(f, "average"),
            StackMethod::Median => write!(f, "median"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionMethod {
    None,
    Sigma,
    #[default]
    WinsorizedSigma,
    MinMax,
    Percentile,
}

impl RejectionMethod {
    /// Single-letter code the engine's stack command expects.
    fn code(self) -> &'static str {
        match self {
            RejectionMethod::None => "n",
            RejectionMethod::Sigma => "s",
            RejectionMethod::WinsorizedSigma => "w",
            RejectionMethod::MinMax => "m",
            RejectionMethod::Percentile => "p",
        }
    }
}

impl std::fmt::Display for RejectionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectionMethod::None => write!(f, "none"),
            RejectionMethod::Sigma => write!(f, "sigma"),
            RejectionMethod::WinsorizedSigma => write!(f, "winsorized_sigma"),
            RejectionMethod::MinMax => write!(f, "minmax"),
            RejectionMethod::Percentile => write!(f, "percentile"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputNorm {
    #[default]
    NoScale,
    AddScale,
    Rejection,
}

impl OutputNorm {
    fn script_token(self) -> &'static str {
        match self {
            OutputNorm::NoScale => "-nonorm",
            OutputNorm::AddScale => "-norm=addscale",
            OutputNorm::Rejection => "-norm=add",
        }
    }
}

impl std::fmt::Display for OutputNorm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputNorm::NoScale => write!(f, "noscale"),
            OutputNorm::AddScale => write!(f, "addscale"),
            OutputNorm::Rejection => write!(f, "rejection"),
        }
    }
}

/// Stacking parameters handed to the engine.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct StackParams {
    #[serde(default)]
    pub method: StackMethod,
    #[serde(default)]
    pub rejection: RejectionMethod,
    #[serde(default = "default_rejection_param")]
    pub rejection_param1: f64,
    #[serde(default = "default_rejection_param")]
    pub rejection_param2: f64,
    #[serde(default)]
    pub norm: OutputNorm,
}

fn default_rejection_param() -> f64 {
    3.0
}

impl Default for StackParams {
    fn default() -> Self {
        Self {
            method: StackMethod::default(),
            rejection: RejectionMethod::default(),
            rejection_param1: default_rejection_param(),
            rejection_param2: default_rejection_param(),
            norm: OutputNorm::default(),
        }
    }
}

impl StackParams {
    /// Canonical textual encoding of the effective parameters.
    ///
    /// Persisted in every master's header and compared on later runs to
    /// detect parameter drift, so the rendering must be identical for
    /// identical parameters in every future run.
    pub fn signature(&self) -> String {
        format!(
            "method={};rej={}:{:.1}:{:.1};norm={}",
            self.method, self.rejection, self.rejection_param1, self.rejection_param2, self.norm
        )
    }

    fn stack_args(&self) -> String {
        match self.method {
            StackMethod::Average => format!(
                "rej {} {} {}",
                self.rejection.code(),
                self.rejection_param1,
                self.rejection_param2
            ),
            StackMethod::Median => "med".to_string(),
        }
    }
}

/// How the engine process is launched. The three modes differ only in the
/// argv prefix; the script content is identical.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Engine installed on the host: `siril -s <script>`.
    Native { binary: PathBuf },
    /// Containerised package: `flatpak run --command=siril <package> -s <script>`.
    Flatpak { package: String },
    /// Self-contained bundle: `<bundle> -s <script>`.
    AppImage { bundle: PathBuf },
}

impl Default for EngineMode {
    fn default() -> Self {
        EngineMode::Native {
            binary: PathBuf::from("siril"),
        }
    }
}

impl EngineMode {
    fn argv(&self, script: &Path) -> Vec<String> {
        let mut argv = match self {
            EngineMode::Native { binary } => vec![binary.display().to_string()],
            EngineMode::Flatpak { package } => vec![
                "flatpak".to_string(),
                "run".to_string(),
                "--command=siril".to_string(),
                package.clone(),
            ],
            EngineMode::AppImage { bundle } => vec![bundle.display().to_string()],
        };
        argv.push("-s".to_string());
        argv.push(script.display().to_string());
        argv
    }

    /// Verify the engine can be launched at all, before any group runs.
    pub fn preflight(&self) -> Result<()> {
        match self {
            EngineMode::Native { binary } => {
                if binary.components().count() > 1 {
                    if binary.is_file() {
                        return Ok(());
                    }
                } else if on_path(binary) {
                    return Ok(());
                }
                Err(UmbraError::EngineNotFound(binary.display().to_string()))
            }
            EngineMode::Flatpak { package } => {
                if on_path(Path::new("flatpak")) {
                    Ok(())
                } else {
                    Err(UmbraError::EngineNotFound(format!(
                        "flatpak (for package {})",
                        package
                    )))
                }
            }
            EngineMode::AppImage { bundle } => {
                if bundle.is_file() {
                    Ok(())
                } else {
                    Err(UmbraError::EngineNotFound(bundle.display().to_string()))
                }
            }
        }
    }
}

fn on_path(binary: &Path) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| dir.join(binary).is_file())
}

/// Generate the stacking script for a staged sequence.
///
/// The script converts the numbered staged files into the engine's native
/// sequence, stacks with the requested parameters and saves the result
/// under [`RESULT_STEM`] inside the staging directory.
pub fn build_script(staging_dir: &Path, params: &StackParams) -> String {
    format!(
        "requires 1.2.0\ncd \"{}\"\nconvert {}\nstack {} {} {} -out={}\n",
        staging_dir.display(),
        SEQUENCE_NAME,
        SEQUENCE_NAME,
        params.stack_args(),
        params.norm.script_token(),
        RESULT_STEM,
    )
}

fn shell_join(argv: &[String]) -> String {
    argv.iter()
        .map(|a| {
            if a.contains(char::is_whitespace) {
                format!("\"{}\"", a)
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of one engine invocation (or would-be invocation in dry-run).
#[derive(Clone, Debug)]
pub struct StackOutcome {
    /// Command line actually (or would-be) used, recorded in the master.
    pub command: String,
    /// Intermediate output path; `None` in dry-run.
    pub output: Option<PathBuf>,
}

/// Drives the external stacking engine. At most one invocation is ever in
/// flight: the engine is multi-threaded and owns intra-group parallelism.
pub struct StackRunner {
    mode: EngineMode,
    params: StackParams,
    dry_run: bool,
}

impl StackRunner {
    pub fn new(mode: EngineMode, params: StackParams, dry_run: bool) -> Self {
        Self {
            mode,
            params,
            dry_run,
        }
    }

    pub fn signature(&self) -> String {
        self.params.signature()
    }

    /// Stack the staged sequence. The engine's exit status is authoritative.
    pub fn run(&self, staging_dir: &Path) -> Result<StackOutcome> {
        let script = build_script(staging_dir, &self.params);
        let mut script_file = tempfile::Builder::new()
            .prefix("umbra_stack_")
            .suffix(".ssf")
            .tempfile()?;
        script_file.write_all(script.as_bytes())?;
        script_file.flush()?;

        let argv = self.mode.argv(script_file.path());
        let command = shell_join(&argv);

        if self.dry_run {
            info!(%command, "dry run, not spawning engine");
            return Ok(StackOutcome {
                command,
                output: None,
            });
        }

        debug!(%command, "spawning stacking engine");
        let status = Command::new(&argv[0])
            .args(&argv[1..])
            .status()
            .map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    UmbraError::EngineNotFound(argv[0].clone())
                } else {
                    UmbraError::Io(err)
                }
            })?;
        if !status.success() {
            return Err(UmbraError::EngineFailed(status.code().unwrap_or(-1)));
        }

        let output = ["fits", "fit", "fts"]
            .iter()
            .map(|ext| staging_dir.join(format!("{}.{}", RESULT_STEM, ext)))
            .find(|p| p.is_file())
            .ok_or_else(|| {
                UmbraError::OutputMissing(staging_dir.join(format!("{}.fits", RESULT_STEM)))
            })?;

        Ok(StackOutcome {
            command,
            output: Some(output),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_canonical_and_stable() {
        let params = StackParams::default();
        assert_eq!(
            params.signature(),
            "method=average;rej=winsorized_sigma:3.0:3.0;norm=noscale"
        );
        assert_eq!(params.signature(), params.signature());
    }

    #[test]
    fn signature_changes_with_any_parameter() {
        let base = StackParams::default();
        let mut sigma = base;
        sigma.rejection = RejectionMethod::Sigma;
        assert_ne!(base.signature(), sigma.signature());

        let mut param = base;
        param.rejection_param1 = 2.5;
        assert_ne!(base.signature(), param.signature());

        let mut median = base;
        median.method = StackMethod::Median;
        assert_ne!(base.signature(), median.signature());
    }

    #[test]
    fn script_contains_sequence_and_result() {
        let script = build_script(Path::new("/tmp/staging"), &StackParams::default());
        assert!(script.starts_with("requires"));
        assert!(script.contains("cd \"/tmp/staging\""));
        assert!(script.contains("convert dark"));
        assert!(script.contains("stack dark rej w 3 3"));
        assert!(script.contains("-nonorm"));
        assert!(script.contains("-out=stack_result"));
    }

    #[test]
    fn median_stack_ignores_rejection_params() {
        let params = StackParams {
            method: StackMethod::Median,
            ..Default::default()
        };
        let script = build_script(Path::new("/s"), &params);
        assert!(script.contains("stack dark med"));
    }

    #[test]
    fn modes_differ_only_in_argv_prefix() {
        let script = Path::new("/tmp/x.ssf");
        let native = EngineMode::Native {
            binary: PathBuf::from("siril"),
        }
        .argv(script);
        let flatpak = EngineMode::Flatpak {
            package: "org.free_astro.siril".into(),
        }
        .argv(script);
        let appimage = EngineMode::AppImage {
            bundle: PathBuf::from("/opt/Siril.AppImage"),
        }
        .argv(script);

        for argv in [&native, &flatpak, &appimage] {
            assert_eq!(argv[argv.len() - 2], "-s");
            assert_eq!(argv[argv.len() - 1], "/tmp/x.ssf");
        }
        assert_eq!(flatpak[0], "flatpak");
        assert_eq!(flatpak[1], "run");
        assert_eq!(flatpak[2], "--command=siril");
    }

    #[test]
    fn dry_run_returns_command_without_spawning() {
        let runner = StackRunner::new(
            EngineMode::Native {
                binary: PathBuf::from("definitely-not-installed"),
            },
            StackParams::default(),
            true,
        );
        let outcome = runner.run(Path::new("/tmp/staging")).unwrap();
        assert!(outcome.command.starts_with("definitely-not-installed -s "));
        assert!(outcome.output.is_none());
    }
}
