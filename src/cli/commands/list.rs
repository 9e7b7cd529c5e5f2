//! # List Command Module / 列表命令模块
//!
//! Prints every environment of the matrix in run order. Environments from the
//! `envlist` are marked as run by default.
//!
//! 按运行顺序打印矩阵中的每个环境。`envlist` 中的环境被标记为默认运行。

use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use crate::core::config::{self, Matrix};
use crate::infra::t;

pub fn execute(config_path: &Path, locale: &str) -> Result<()> {
    let matrix = config::load_matrix(config_path, Vec::new())
        .with_context(|| t!("run.config_failed", locale = locale, path = config_path.display()).to_string())?;

    println!("{}", t!("list.header", locale = locale).bold());
    for line in render_lines(&matrix) {
        println!("{line}");
    }
    Ok(())
}

/// One line per environment: a `*` marker for defaults, the name, the
/// interpreter and the description.
pub fn render_lines(matrix: &Matrix) -> Vec<String> {
    let width = matrix.names().map(str::len).max().unwrap_or(0);
    matrix
        .environments
        .iter()
        .map(|env| {
            let marker = if matrix.envlist.is_empty() || matrix.envlist.contains(&env.name) {
                "*"
            } else {
                " "
            };
            let mut line = format!(
                "{} {:<width$}  [{}]",
                marker,
                env.name,
                env.interpreter,
                width = width
            );
            if let Some(description) = &env.description {
                line.push_str("  ");
                line.push_str(description);
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{LoadContext, parse_matrix};
    use std::path::PathBuf;

    #[test]
    fn defaults_are_marked() {
        let text = r#"
            [tox]
            envlist = ["py311"]

            [testenv]
            commands = ["pytest"]

            [env.lint]
            description = "style checks"
        "#;
        let ctx = LoadContext {
            toxinidir: PathBuf::from("/project"),
            posargs: vec![],
        };
        let matrix = parse_matrix(text, &ctx).unwrap();
        let lines = render_lines(&matrix);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("* py311"));
        assert!(lines[0].contains("[python3.11]"));
        assert!(lines[1].starts_with("  lint"));
        assert!(lines[1].ends_with("style checks"));
    }
}
