use crate::sanitize::sanitize_path;
use crate::{MappingPlan, MappingSource};
use anyhow::{Context, Result};
use guidfix_core::TreePair;
use std::io::{BufRead, Write};

/// Interactive entry: pairs of incorrect/correct paths until an empty line,
/// then the target tree.
pub struct ManualSource<R, W> {
    input: R,
    prompt: W,
}

impl<R: BufRead, W: Write> ManualSource<R, W> {
    pub fn new(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }

    /// `None` on EOF
    fn ask(&mut self, question: &str) -> Result<Option<String>> {
        writeln!(self.prompt, "{question}").context("write prompt")?;
        self.prompt.flush().context("flush prompt")?;

        let mut line = String::new();
        let read = self.input.read_line(&mut line).context("read input")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R: BufRead, W: Write> MappingSource for ManualSource<R, W> {
    fn load(&mut self) -> Result<MappingPlan> {
        let mut plan = MappingPlan::default();

        loop {
            let n = plan.pairs.len() + 1;
            let incorrect = match self.ask(&format!(
                "[{n}] Path to the folder with the incorrect identifiers (empty to finish):"
            ))? {
                Some(line) => sanitize_path(&line),
                None => break,
            };
            let Some(incorrect) = incorrect else {
                break;
            };

            let correct = self
                .ask(&format!(
                    "[{n}] Path to the folder with the correct identifiers:"
                ))?
                .and_then(|line| sanitize_path(&line));
            let Some(correct) = correct else {
                log::warn!("No correct folder given for {}, dropping it", incorrect.display());
                plan.rejected += 1;
                break;
            };

            plan.pairs.push(TreePair::new(incorrect, correct));
        }

        if !plan.pairs.is_empty() {
            plan.target = self
                .ask("Path to the project tree to rewrite (usually its Assets folder):")?
                .and_then(|line| sanitize_path(&line));
        }

        Ok(plan)
    }
}
