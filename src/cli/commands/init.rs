//! # Matrix Initialization Module / 矩阵初始化模块
//!
//! This module provides the `init` command: an interactive wizard that writes
//! a starter `tox.toml` with the interpreters and auxiliary environments the
//! user picks.
//!
//! 此模块提供 `init` 命令：一个交互式向导，
//! 根据用户选择的解释器和辅助环境写入初始的 `tox.toml`。

use anyhow::{Context, Result, bail};
use colored::*;
use dialoguer::{Confirm, MultiSelect, theme::ColorfulTheme};
use std::fs;
use std::path::Path;

use crate::infra::t;

/// Interpreter factors offered by the wizard.
pub const INTERPRETER_CHOICES: &[&str] = &["py39", "py310", "py311", "py312", "py313", "pypy310"];
/// Pre-selected interpreters, also used by `--non-interactive`.
const DEFAULT_INTERPRETERS: &[&str] = &["py311", "py312"];

/// What the generated file contains.
/// 生成的文件包含的内容。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitChoices {
    pub interpreters: Vec<String>,
    pub lint: bool,
    pub coverage: bool,
}

impl Default for InitChoices {
    fn default() -> Self {
        Self {
            interpreters: DEFAULT_INTERPRETERS.iter().map(|s| s.to_string()).collect(),
            lint: true,
            coverage: false,
        }
    }
}

/// Renders the configuration text for `choices`.
/// 为 `choices` 生成配置文本。
pub fn render_config(choices: &InitChoices) -> String {
    let mut envlist: Vec<&str> = choices.interpreters.iter().map(String::as_str).collect();
    if choices.lint {
        envlist.push("lint");
    }
    if choices.coverage {
        envlist.push("coverage");
    }
    let quoted: Vec<String> = envlist.iter().map(|e| format!("\"{e}\"")).collect();

    let mut out = format!(
        r#"# Test environment matrix / 测试环境矩阵
[tox]
envlist = [{envlist}]
skip_missing_interpreters = true

# Shared by every environment / 所有环境共享
[testenv]
description = "run the test suite"
deps = ["pytest"]
commands = ["python -m pytest {{posargs}}"]
"#,
        envlist = quoted.join(", ")
    );
    if choices.lint {
        out.push_str(LINT_SECTION);
    }
    if choices.coverage {
        out.push_str(COVERAGE_SECTION);
    }
    out
}

const LINT_SECTION: &str = r#"
[env.lint]
description = "style checks"
deps = ["flake8"]
commands = ["flake8 {toxinidir}"]
"#;

const COVERAGE_SECTION: &str = r#"
[env.coverage]
description = "tests with coverage"
deps = ["pytest", "coverage"]
setenv = { COVERAGE_FILE = "{envdir}/.coverage" }
commands = [
    "coverage run -m pytest {posargs}",
    "coverage report",
]
"#;

/// Runs the interactive wizard to generate the configuration file.
///
/// With `non_interactive` the default choices are written without prompting.
/// An existing file is only replaced with `force` or after confirmation.
///
/// 运行交互式向导以生成配置文件。使用 `non_interactive` 时不提示，直接写入默认选择。
/// 已存在的文件只有在 `force` 或确认后才会被替换。
pub fn run_init_wizard(config_path: &Path, language: &str, non_interactive: bool, force: bool) -> Result<()> {
    let theme = ColorfulTheme::default();
    let shown = config_path.display().to_string();

    if config_path.exists() && !force {
        if non_interactive {
            bail!(t!("init.file_exists", locale = language, path = &shown).to_string());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", locale = language, path = &shown))
            .default(false)
            .interact()
            .context(t!("init.confirmation_failed", locale = language).to_string())?;
        if !confirmation {
            println!("{}", t!("init.aborted", locale = language));
            return Ok(());
        }
    }

    let choices = if non_interactive {
        InitChoices::default()
    } else {
        println!("\n{}", t!("init.welcome", locale = language).cyan().bold());
        println!("{}", t!("init.description", locale = language));
        prompt_choices(&theme, language)?
    };

    write_config(config_path, &choices, language)
}

fn prompt_choices(theme: &ColorfulTheme, language: &str) -> Result<InitChoices> {
    let defaults: Vec<bool> = INTERPRETER_CHOICES
        .iter()
        .map(|c| DEFAULT_INTERPRETERS.contains(c))
        .collect();
    let picked = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.interpreter_prompt", locale = language))
        .items(INTERPRETER_CHOICES)
        .defaults(&defaults)
        .interact()
        .context(t!("init.confirmation_failed", locale = language).to_string())?;

    let extras = [
        t!("init.extra_lint", locale = language).to_string(),
        t!("init.extra_coverage", locale = language).to_string(),
    ];
    let extra_picks = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.extras_prompt", locale = language))
        .items(&extras[..])
        .defaults(&[true, false])
        .interact()
        .context(t!("init.confirmation_failed", locale = language).to_string())?;

    let mut choices = InitChoices {
        interpreters: picked.iter().map(|&i| INTERPRETER_CHOICES[i].to_string()).collect(),
        lint: extra_picks.contains(&0),
        coverage: extra_picks.contains(&1),
    };
    if choices.interpreters.is_empty() {
        println!("{}", t!("init.no_interpreters", locale = language).yellow());
        choices.interpreters = InitChoices::default().interpreters;
    }
    Ok(choices)
}

fn write_config(path: &Path, choices: &InitChoices, language: &str) -> Result<()> {
    let shown = path.display().to_string();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| t!("init.write_failed", locale = language, path = &shown).to_string())?;
    }
    fs::write(path, render_config(choices))
        .with_context(|| t!("init.write_failed", locale = language, path = &shown).to_string())?;

    println!(
        "\n{} {}",
        "✔".green(),
        t!("init.success", locale = language, path = &shown).bold()
    );
    println!("{}", t!("init.usage_hint", locale = language));
    Ok(())
}
