//! Postprocessing statements (`@plot`, `@vexport`, `@figure`, ...).
//!
//! These are not executed by the compiler. Each one keeps the parameters in
//! effect at its line and the run it refers to, so that whoever renders it
//! can evaluate its expressions against a [`ScriptOutput`].

use rand::rngs::StdRng;
use strum::{Display, EnumIter, EnumString};

use super::CompileError;
use crate::error::InternalResult;
use crate::output::{EvalKind, ScriptOutput, Series};
use crate::parameters::{ParameterEnv, ParameterName, Parameters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum CommandKind {
    #[strum(serialize = "@plot")]
    Plot,
    #[strum(serialize = "@vplot")]
    VPlot,
    #[strum(serialize = "@wplot")]
    WPlot,
    #[strum(serialize = "@vssplot")]
    VssPlot,
    #[strum(serialize = "@pplot")]
    PPlot,
    #[strum(serialize = "@nplot")]
    NPlot,
    #[strum(serialize = "@figure")]
    Figure,
    #[strum(to_string = "@subplot", serialize = "@panel")]
    Subplot,
    #[strum(serialize = "@legend")]
    Legend,
    #[strum(serialize = "@export")]
    Export,
    #[strum(serialize = "@vexport")]
    VExport,
    #[strum(serialize = "@wexport")]
    WExport,
    #[strum(serialize = "@vssexport")]
    VssExport,
    #[strum(serialize = "@pexport")]
    PExport,
    #[strum(serialize = "@nexport")]
    NExport,
    #[strum(serialize = "@hexport")]
    HExport,
}

impl CommandKind {
    /// Recognises the first word of a line; `@figure(2,1)` counts as `@figure`.
    pub fn parse(word: &str) -> Option<Self> {
        let word = match word.find('(') {
            Some(pos) if word[..pos].eq_ignore_ascii_case("@figure") => &word[..pos],
            _ => word,
        };
        word.parse().ok()
    }

    /// Which recorded series the command's expressions select.
    pub fn eval_kind(&self) -> Option<EvalKind> {
        match self {
            CommandKind::VPlot | CommandKind::VExport => Some(EvalKind::V),
            CommandKind::WPlot | CommandKind::WExport => Some(EvalKind::W),
            CommandKind::VssPlot | CommandKind::VssExport => Some(EvalKind::Vss),
            CommandKind::PPlot | CommandKind::PExport => Some(EvalKind::P),
            CommandKind::NPlot | CommandKind::NExport => Some(EvalKind::N),
            _ => None,
        }
    }

    pub fn is_export(&self) -> bool {
        matches!(
            self,
            CommandKind::Export
                | CommandKind::VExport
                | CommandKind::WExport
                | CommandKind::VssExport
                | CommandKind::PExport
                | CommandKind::NExport
                | CommandKind::HExport
        )
    }

    /// Plots and exports read the output of a run.
    pub fn reads_run(&self) -> bool {
        !matches!(
            self,
            CommandKind::Figure | CommandKind::Subplot | CommandKind::Legend
        )
    }
}

#[derive(Debug, Clone)]
pub struct PostCommand {
    pub kind: CommandKind,
    pub line: usize,
    /// Text after the command word, as written.
    pub arguments: String,
    /// Parameters in effect at the command, `runlabel` resolved.
    pub parameters: Parameters,
    pub run_label: Option<String>,
}

impl PostCommand {
    /// Resolves the run a command refers to: `runlabel` if set, else the
    /// last run declared before it.
    pub(super) fn new(
        kind: CommandKind,
        line: usize,
        arguments: &str,
        parameters: &Parameters,
        run_labels: &[String],
        env: &ParameterEnv,
        rng: &mut StdRng,
    ) -> Result<Self, CompileError> {
        let arguments = arguments.trim();
        if kind.eval_kind().is_some() && arguments.is_empty() {
            return Err(CompileError::new(line, format!("Invalid {} command.", kind)));
        }
        if kind == CommandKind::HExport && arguments.is_empty() && parameters.filename().is_empty() {
            return Err(CompileError::new(line, format!("Invalid {} command.", kind)));
        }

        let mut parameters = parameters.clone();
        let run_label = if kind.reads_run() {
            let last = run_labels
                .last()
                .ok_or_else(|| CompileError::new(line, "There is no @RUN."))?;
            let label = match parameters.runlabel() {
                "" => last.clone(),
                label if run_labels.iter().any(|l| l == label) => label.to_string(),
                label => {
                    return Err(CompileError::new(
                        line,
                        format!("Unknown run label '{}'.", label),
                    ))
                }
            };
            parameters
                .set(ParameterName::Runlabel, &label, env, rng)
                .map_err(|e| CompileError::new(line, e.0))?;
            Some(label)
        } else {
            None
        };

        Ok(Self {
            kind,
            line,
            arguments: arguments.to_string(),
            parameters,
            run_label,
        })
    }

    /// Arguments without a trailing `{...}` property block and, for exports,
    /// without the file name.
    fn body(&self) -> (&str, Option<&str>) {
        let text = match self.arguments.rfind('{') {
            Some(pos) if self.arguments.trim_end().ends_with('}') => self.arguments[..pos].trim(),
            _ => self.arguments.as_str(),
        };
        if !self.kind.is_export() {
            return (text, None);
        }
        match text.rfind(char::is_whitespace) {
            Some(pos) if !text[..pos].trim_end().ends_with(|c: char| matches!(c, ',' | ';' | '-' | '>')) => {
                (text[..pos].trim(), Some(text[pos..].trim()))
            }
            _ if self.kind == CommandKind::HExport => ("", Some(text).filter(|t| !t.is_empty())),
            _ => (text, None),
        }
    }

    /// The `;`-separated expressions of the command.
    pub fn expressions(&self) -> Vec<&str> {
        let (text, _) = self.body();
        text.split(';')
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .collect()
    }

    /// File an export writes to: the one on the line, else `filename`.
    pub fn filename(&self) -> Option<&str> {
        if !self.kind.is_export() {
            return None;
        }
        match self.body() {
            (_, Some(name)) => Some(name),
            _ => Some(self.parameters.filename()).filter(|f| !f.is_empty()),
        }
    }

    /// Evaluates every expression of a `@vplot`-like command.
    pub fn evaluate(&self, output: &ScriptOutput) -> InternalResult<Vec<(String, Series)>> {
        let Some(kind) = self.kind.eval_kind() else {
            return Ok(Vec::new());
        };
        self.expressions()
            .into_iter()
            .map(|expr| {
                output
                    .vwpn_eval(kind, expr, &self.parameters)
                    .map(|series| (expr.to_string(), series))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variables::Variables;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    fn command(kind: CommandKind, arguments: &str, runs: &[&str]) -> Result<PostCommand, CompileError> {
        let variables = Variables::new();
        let env = ParameterEnv {
            variables: &variables,
            phase_labels: &[],
            line_labels: &[],
        };
        let runs: Vec<String> = runs.iter().map(|s| s.to_string()).collect();
        let mut rng = StdRng::seed_from_u64(0);
        PostCommand::new(kind, 7, arguments, &Parameters::new(), &runs, &env, &mut rng)
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!(CommandKind::parse("@VPLOT"), Some(CommandKind::VPlot));
        assert_eq!(CommandKind::parse("@figure(2,1)"), Some(CommandKind::Figure));
        assert_eq!(CommandKind::parse("@panel"), Some(CommandKind::Subplot));
        assert_eq!(CommandKind::parse("@phase"), None);
    }

    #[test]
    fn test_expressions_and_filename() {
        let plot = command(CommandKind::VPlot, "s->b; s->c {'color': 'red'}", &["run1"]).unwrap();
        assert_eq!(plot.expressions(), vec!["s->b", "s->c"]);
        assert_eq!(plot.filename(), None);
        assert_eq!(plot.run_label.as_deref(), Some("run1"));

        let export = command(CommandKind::NExport, "s1, s2->b out.csv", &["a", "b"]).unwrap();
        assert_eq!(export.expressions(), vec!["s1, s2->b"]);
        assert_eq!(export.filename(), Some("out.csv"));
        assert_eq!(export.run_label.as_deref(), Some("b"));

        let export = command(CommandKind::NExport, "s1, s2->b", &["a"]).unwrap();
        assert_eq!(export.expressions(), vec!["s1, s2->b"]);
        assert_eq!(export.filename(), None);
    }

    #[test]
    fn test_command_errors() {
        assert_eq!(
            command(CommandKind::VPlot, "s->b", &[]).unwrap_err().to_string(),
            "Error on line 7: There is no @RUN."
        );
        assert_eq!(
            command(CommandKind::PPlot, "", &["run1"]).unwrap_err().to_string(),
            "Error on line 7: Invalid @pplot command."
        );
        assert!(command(CommandKind::Figure, "", &[]).is_ok());
    }
}
