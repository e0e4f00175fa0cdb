use std::fs;
use std::path::{Path, PathBuf};

use camp_core::serde::{read_json, write_json};
use camp_core::CampError;
use camp_exp::BatchLayout;
use serde::{Deserialize, Serialize};

/// Shell commands making up one run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunCommands {
    /// Setup commands; each must succeed before the next.
    #[serde(default)]
    pub pre: Vec<String>,
    /// Main command.
    pub exec: String,
    /// Cleanup commands; run whatever the outcome of `exec`.
    #[serde(default)]
    pub post: Vec<String>,
}

impl RunCommands {
    /// Renders the run as one line executed from `dir`:
    /// `cd <dir> && { pre… && exec ; post… ; }`.
    ///
    /// Post commands only run once the `cd` succeeded.
    pub fn render_line(&self, dir: &Path) -> String {
        let cd = format!("cd {}", shell_quote(&dir.display().to_string()));
        let mut chain = self.pre.clone();
        chain.push(self.exec.clone());
        let body = chain.join(" && ");
        if self.post.is_empty() {
            return format!("{cd} && {body}");
        }
        let mut group = body;
        for post in &self.post {
            group.push_str(" ; ");
            group.push_str(post);
        }
        format!("{cd} && {{ {group} ; }}")
    }
}

/// Quotes `text` for a POSIX shell unless it is made of safe characters only.
pub(crate) fn shell_quote(text: &str) -> String {
    if text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-+=,:".contains(c))
    {
        text.to_string()
    } else {
        format!("'{}'", text.replace('\'', r"'\''"))
    }
}

/// Commands of one run, with its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunEntry {
    pub run: String,
    /// Working directory for the run commands.
    pub dir: PathBuf,
    pub output_dir: PathBuf,
    pub commands: RunCommands,
}

impl RunEntry {
    pub fn line(&self) -> String {
        self.commands.render_line(&self.dir)
    }
}

/// Contents of `inputs/commands.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentCommands {
    pub experiment: String,
    pub runs: Vec<RunEntry>,
}

impl ExperimentCommands {
    pub fn store(&self, layout: &BatchLayout) -> Result<(), CampError> {
        write_json(&layout.commands_path(&self.experiment), self)
    }

    pub fn load(layout: &BatchLayout, experiment: &str) -> Result<Self, CampError> {
        read_json(&layout.commands_path(experiment))
    }
}

/// Writes one command line per entry to `path`.
pub fn write_command_file(path: &Path, lines: &[String]) -> Result<(), CampError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CampError::io("io.create_dir", parent, err))?;
    }
    let mut body = lines.join("\n");
    body.push('\n');
    fs::write(path, body).map_err(|err| CampError::io("io.write", path, err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_orders_pre_exec_post() {
        let cmds = RunCommands {
            pre: vec!["mkdir -p out".into(), "sync".into()],
            exec: "sim -c run.xml".into(),
            post: vec!["rm -f core".into()],
        };
        assert_eq!(
            cmds.render_line(Path::new("/b/exp0/inputs/run_0")),
            "cd /b/exp0/inputs/run_0 && { mkdir -p out && sync && sim -c run.xml ; rm -f core ; }"
        );
    }

    #[test]
    fn post_commands_need_the_working_directory() {
        let cmds = RunCommands {
            pre: Vec::new(),
            exec: "sim".into(),
            post: vec!["rm -f core".into()],
        };
        let line = cmds.render_line(Path::new("/gone"));
        let (cd, rest) = line.split_once(" && ").expect("chained");
        assert_eq!(cd, "cd /gone");
        assert!(rest.starts_with('{') && rest.ends_with('}'), "{rest}");
        assert!(!line.contains("} ;"));
    }

    #[test]
    fn odd_directories_are_quoted() {
        let cmds = RunCommands {
            exec: "true".into(),
            ..RunCommands::default()
        };
        assert_eq!(cmds.render_line(Path::new("/a b/it's")), r"cd '/a b/it'\''s' && true");
    }
}
