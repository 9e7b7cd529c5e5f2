//! # Matrix Configuration / 矩阵配置
//!
//! Parses a `tox.toml` matrix into ordered, fully resolved
//! [`EnvironmentDescriptor`]s. The schema is strict: unknown keys are rejected
//! with field-level messages, base sections are resolved eagerly and every
//! environment must end up with a non-empty command list.
//!
//! 将 `tox.toml` 矩阵解析为有序、完全解析的 [`EnvironmentDescriptor`]。
//! 模式是严格的：未知键会被拒绝，基础配置段会被立即解析，
//! 每个环境最终都必须有非空的命令列表。

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::core::error::ConfigError;
use crate::core::models::EnvironmentDescriptor;
use crate::infra::fs::{bin_dir, interpreter_in};

/// Default interpreter when neither `basepython` nor the environment name says otherwise.
pub const DEFAULT_INTERPRETER: &str = "python3";
/// Default directory, relative to the config file, holding cached contexts.
pub const DEFAULT_WORKDIR: &str = ".tox";

/// The `[tox]` section: settings that apply to the whole matrix.
/// `[tox]` 配置段：适用于整个矩阵的设置。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToxSettings {
    /// Environments run when none are selected explicitly, in run order.
    /// 未显式选择时运行的环境，按运行顺序排列。
    #[serde(default)]
    pub envlist: Vec<String>,
    /// Matrix-wide default for the per-environment flag of the same name.
    #[serde(default)]
    pub skip_missing_interpreters: Option<bool>,
    /// Directory holding the cached contexts, relative to the config file.
    #[serde(default)]
    pub workdir: Option<String>,
}

/// A command as written in the file: either a shell-style line or an argv array.
/// 文件中书写的命令：shell 风格的字符串或 argv 数组。
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CommandSpec {
    Line(String),
    Argv(Vec<String>),
}

/// One section of the file, `[testenv]`, `[base.*]` or `[env.*]`. Every key is
/// optional so that sections can inherit from each other.
/// 文件中的一个配置段。所有键都是可选的，以便配置段之间可以继承。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SectionSpec {
    /// Name of a `[base.*]` section to inherit from.
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub basepython: Option<String>,
    #[serde(default)]
    pub deps: Option<Vec<String>>,
    #[serde(default)]
    pub setenv: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub passenv: Option<Vec<String>>,
    #[serde(default)]
    pub commands: Option<Vec<CommandSpec>>,
    #[serde(default)]
    pub skip_missing_interpreters: Option<bool>,
    #[serde(default)]
    pub usedevelop: Option<bool>,
    #[serde(default)]
    pub envdir: Option<String>,
    #[serde(default)]
    pub changedir: Option<String>,
    #[serde(default)]
    pub install_command: Option<Vec<String>>,
    #[serde(default)]
    pub create_command: Option<Vec<String>>,
    #[serde(default)]
    pub ignore_errors: Option<bool>,
}

/// The raw file layout before inheritance is resolved.
/// 继承解析之前的原始文件结构。
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MatrixFile {
    #[serde(default)]
    pub tox: ToxSettings,
    /// Shared base of every environment.
    #[serde(default)]
    pub testenv: SectionSpec,
    /// Named, non-runnable base sections.
    #[serde(default)]
    pub base: BTreeMap<String, SectionSpec>,
    /// Runnable environment sections.
    #[serde(default)]
    pub env: BTreeMap<String, SectionSpec>,
}

/// Inputs the loader needs besides the file text.
/// 加载器除文件文本外所需的输入。
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Directory containing the configuration file (`{toxinidir}`).
    pub toxinidir: PathBuf,
    /// Positional arguments substituted for `{posargs}`.
    pub posargs: Vec<String>,
}

/// A loaded matrix: every declared environment in matrix order.
/// 已加载的矩阵：按矩阵顺序排列的所有已声明环境。
#[derive(Debug, Clone)]
pub struct Matrix {
    /// The `envlist`, i.e. the default selection.
    pub envlist: Vec<String>,
    pub environments: Vec<EnvironmentDescriptor>,
    pub toxinidir: PathBuf,
    pub workdir: PathBuf,
}

impl Matrix {
    pub fn get(&self, name: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.iter().find(|env| env.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.environments.iter().map(|env| env.name.as_str())
    }
}

/// Reads and parses the matrix at `path`. `{toxinidir}` is the file's directory.
/// 读取并解析 `path` 处的矩阵。`{toxinidir}` 为该文件所在目录。
pub fn load_matrix(path: &Path, posargs: Vec<String>) -> Result<Matrix, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let toxinidir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    // Contexts and `{toxinidir}` must not depend on each command's cwd.
    let toxinidir = fs::canonicalize(&toxinidir).unwrap_or(toxinidir);
    parse_matrix(&text, &LoadContext { toxinidir, posargs })
}

/// Parses matrix text. Pure: touches neither the filesystem nor the process environment.
/// 解析矩阵文本。纯函数：不访问文件系统或进程环境。
pub fn parse_matrix(text: &str, ctx: &LoadContext) -> Result<Matrix, ConfigError> {
    let file: MatrixFile = toml::from_str(text)?;

    let workdir = ctx.toxinidir.join(expand_path(
        file.tox.workdir.as_deref().unwrap_or(DEFAULT_WORKDIR),
    ));

    let mut seen = HashSet::new();
    for name in &file.tox.envlist {
        validate_name(name)?;
        if !seen.insert(name.as_str()) {
            return Err(ConfigError::DuplicateEnvironment(name.clone()));
        }
    }

    let mut order: Vec<&str> = file.tox.envlist.iter().map(String::as_str).collect();
    for name in file.env.keys() {
        validate_name(name)?;
        if !seen.contains(name.as_str()) {
            order.push(name);
        }
    }

    let environments = order
        .into_iter()
        .map(|name| resolve_environment(&file, name, &workdir, ctx))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Matrix {
        envlist: file.tox.envlist.clone(),
        environments,
        toxinidir: ctx.toxinidir.clone(),
        workdir,
    })
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    let bad = name.trim().is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_whitespace);
    if bad {
        return Err(ConfigError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Collects the sections `name` inherits from, nearest first, ending with `[testenv]`.
fn inheritance_chain<'a>(
    file: &'a MatrixFile,
    name: &str,
) -> Result<Vec<&'a SectionSpec>, ConfigError> {
    let mut chain = Vec::new();
    let mut visited: Vec<String> = Vec::new();
    let mut current = file.env.get(name);
    let mut current_name = name.to_string();

    while let Some(section) = current {
        chain.push(section);
        let Some(base) = section.base.as_deref() else {
            break;
        };
        if visited.iter().any(|v| v == base) {
            let mut chain = vec![name.to_string()];
            chain.extend(visited);
            chain.push(base.to_string());
            return Err(ConfigError::BaseCycle { chain });
        }
        let next = file
            .base
            .get(base)
            .ok_or_else(|| ConfigError::MissingBase {
                section: current_name.clone(),
                base: base.to_string(),
            })?;
        visited.push(base.to_string());
        current_name = base.to_string();
        current = Some(next);
    }

    // Every section already falls back to `[testenv]`.
    if let Some(base) = &file.testenv.base {
        return Err(ConfigError::BaseCycle {
            chain: vec!["testenv".to_string(), base.clone(), "testenv".to_string()],
        });
    }
    chain.push(&file.testenv);
    Ok(chain)
}

/// Returns the nearest value of `field` along the chain.
fn pick<'a, T>(
    chain: &[&'a SectionSpec],
    field: impl Fn(&'a SectionSpec) -> Option<&'a T>,
) -> Option<&'a T> {
    chain.iter().find_map(|section| field(*section))
}

fn resolve_environment(
    file: &MatrixFile,
    name: &str,
    workdir: &Path,
    ctx: &LoadContext,
) -> Result<EnvironmentDescriptor, ConfigError> {
    let chain = inheritance_chain(file, name)?;

    // `envdir` itself can only refer to placeholders that do not depend on it.
    let vars = Substitutions::new(name, ctx);
    let envdir = normalize(&match pick(&chain, |s| s.envdir.as_ref()) {
        Some(dir) => ctx.toxinidir.join(expand_path(&vars.apply(dir))),
        None => workdir.join(name),
    });
    // A context directory must never enclose the project.
    if normalize(&ctx.toxinidir).starts_with(&envdir) {
        return Err(ConfigError::EnvdirContainsProject {
            env: name.to_string(),
            envdir,
        });
    }
    let vars = vars.with_envdir(&envdir);

    let interpreter = pick(&chain, |s| s.basepython.as_ref())
        .cloned()
        .or_else(|| interpreter_from_name(name))
        .unwrap_or_else(|| DEFAULT_INTERPRETER.to_string());

    // Farthest section first so nearer sections override keys.
    let mut setenv = BTreeMap::new();
    for section in chain.iter().rev() {
        if let Some(vars_map) = &section.setenv {
            for (key, value) in vars_map {
                setenv.insert(key.clone(), vars.apply(value));
            }
        }
    }

    let command_specs = pick(&chain, |s| s.commands.as_ref())
        .filter(|cmds| !cmds.is_empty())
        .ok_or_else(|| ConfigError::MissingField {
            env: name.to_string(),
            field: "commands",
        })?;
    let commands = command_specs
        .iter()
        .map(|spec| split_command(name, spec).map(|argv| vars.apply_argv(&argv)))
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(empty) = commands.iter().position(|argv| argv.is_empty()) {
        return Err(ConfigError::InvalidCommand {
            env: name.to_string(),
            command: format!("#{}", empty + 1),
            reason: "command is empty".to_string(),
        });
    }

    let changedir = match pick(&chain, |s| s.changedir.as_ref()) {
        Some(dir) => ctx.toxinidir.join(expand_path(&vars.apply(dir))),
        None => ctx.toxinidir.clone(),
    };

    let skip_missing_interpreters = pick(&chain, |s| s.skip_missing_interpreters.as_ref())
        .copied()
        .or(file.tox.skip_missing_interpreters)
        .unwrap_or(false);

    Ok(EnvironmentDescriptor {
        name: name.to_string(),
        description: pick(&chain, |s| s.description.as_ref()).cloned(),
        interpreter,
        deps: pick(&chain, |s| s.deps.as_ref())
            .map(|deps| deps.iter().map(|dep| vars.apply(dep)).collect())
            .unwrap_or_default(),
        setenv,
        passenv: pick(&chain, |s| s.passenv.as_ref())
            .cloned()
            .unwrap_or_default(),
        commands,
        skip_missing_interpreters,
        usedevelop: pick(&chain, |s| s.usedevelop.as_ref())
            .copied()
            .unwrap_or(false),
        toxinidir: ctx.toxinidir.clone(),
        envdir,
        changedir,
        install_command: pick(&chain, |s| s.install_command.as_ref())
            .cloned()
            .unwrap_or_else(default_install_command),
        create_command: pick(&chain, |s| s.create_command.as_ref())
            .cloned()
            .unwrap_or_else(default_create_command),
        ignore_errors: pick(&chain, |s| s.ignore_errors.as_ref())
            .copied()
            .unwrap_or(false),
    })
}

pub fn default_install_command() -> Vec<String> {
    ["{envpython}", "-m", "pip", "install", "{packages}"]
        .map(String::from)
        .to_vec()
}

pub fn default_create_command() -> Vec<String> {
    ["{basepython}", "-m", "venv", "{envdir}"]
        .map(String::from)
        .to_vec()
}

fn split_command(env: &str, spec: &CommandSpec) -> Result<Vec<String>, ConfigError> {
    match spec {
        CommandSpec::Argv(argv) => Ok(argv.clone()),
        CommandSpec::Line(line) => shlex::split(line).ok_or_else(|| ConfigError::InvalidCommand {
            env: env.to_string(),
            command: line.clone(),
            reason: "unbalanced quotes".to_string(),
        }),
    }
}

/// Derives an interpreter from the first factor of an environment name,
/// e.g. `py311-django` selects `python3.11`.
/// 从环境名称的第一个因子推导解释器，例如 `py311-django` 选择 `python3.11`。
pub fn interpreter_from_name(name: &str) -> Option<String> {
    let factor = name.split('-').next()?;
    let (program, version) = if let Some(v) = factor.strip_prefix("pypy") {
        ("pypy", v)
    } else if let Some(v) = factor.strip_prefix("py") {
        ("python", v)
    } else {
        return None;
    };
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (major, minor) = version.split_at(1);
    if minor.is_empty() {
        Some(format!("{program}{major}"))
    } else {
        Some(format!("{program}{major}.{minor}"))
    }
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

/// Resolves `.` and `..` lexically, without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// Placeholder values available inside commands, `deps`, `setenv`,
/// `changedir` and (without the context paths) `envdir`.
struct Substitutions {
    pairs: Vec<(&'static str, String)>,
    posargs: Vec<String>,
}

impl Substitutions {
    fn new(name: &str, ctx: &LoadContext) -> Self {
        Self {
            pairs: vec![
                ("{toxinidir}", ctx.toxinidir.display().to_string()),
                ("{envname}", name.to_string()),
            ],
            posargs: ctx.posargs.clone(),
        }
    }

    fn with_envdir(mut self, envdir: &Path) -> Self {
        let bindir = bin_dir(envdir);
        let envpython = interpreter_in(&bindir);
        self.pairs.extend([
            ("{envdir}", envdir.display().to_string()),
            ("{envbindir}", bindir.display().to_string()),
            ("{envpython}", envpython.display().to_string()),
        ]);
        self
    }

    fn apply(&self, value: &str) -> String {
        let mut out = value.to_string();
        for (key, replacement) in &self.pairs {
            if out.contains(key) {
                out = out.replace(key, replacement);
            }
        }
        if out.contains("{posargs}") {
            out = out.replace("{posargs}", &self.posargs.join(" "));
        }
        out
    }

    /// Like [`Self::apply`], but a bare `{posargs}` argument expands to zero or more arguments.
    fn apply_argv(&self, argv: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(argv.len());
        for arg in argv {
            if arg == "{posargs}" {
                out.extend(self.posargs.iter().cloned());
            } else {
                out.push(self.apply(arg));
            }
        }
        out
    }
}
