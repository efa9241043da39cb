//! Line-oriented review session over a [`DecisionQueue`].
//!
//! Reads one command per line and prints the current record after each one.
//! Errors are printed and the loop keeps going; only `q` or end of input
//! stops it.
//!
//! ```text
//! i        include          e        exclude
//! a        decide by criteria
//! n / p    next / previous position
//! g N      go to position N (1-based)
//! s        skip to next undecided
//! c NAME   cycle criterion NAME (TODO -> in -> out)
//! r        reload the current record from the engine
//! q        quit             h        help
//! ```
use crate::engine::ReviewEngine;
use crate::error::{ErrorClass, QueueError};
use crate::queue::{render_bar, Cursor, Decision, DecisionQueue, QueueCounts};
use anyhow::{Context, Result};
use std::io::{BufRead, Write};

const ABSTRACT_PREVIEW_CHARS: usize = 600;

const HELP: &str = "\
commands:
  i        include current record
  e        exclude current record
  a        decide by criteria
  n / p    next / previous position
  g N      go to position N
  s        skip to next undecided
  c NAME   cycle criterion NAME (TODO -> in -> out)
  r        reload current record
  q        quit
  h        this help";

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionCommand {
    Decide(Decision),
    Accept,
    Next,
    Previous,
    Goto(usize),
    Skip,
    Criterion(String),
    Refresh,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Result<SessionCommand, String> {
    let mut parts = line.split_whitespace();
    let Some(head) = parts.next() else {
        return Err("empty command; h for help".to_string());
    };
    let rest: Vec<&str> = parts.collect();
    let command = match (head, rest.as_slice()) {
        ("i", []) => SessionCommand::Decide(Decision::Include),
        ("e", []) => SessionCommand::Decide(Decision::Exclude),
        ("a", []) => SessionCommand::Accept,
        ("n", []) => SessionCommand::Next,
        ("p", []) => SessionCommand::Previous,
        ("s", []) => SessionCommand::Skip,
        ("r", []) => SessionCommand::Refresh,
        ("q", []) => SessionCommand::Quit,
        ("h", []) | ("?", []) => SessionCommand::Help,
        ("g", [position]) => {
            let position: usize = position
                .parse()
                .map_err(|_| format!("not a position: {position}"))?;
            if position == 0 {
                return Err("positions start at 1".to_string());
            }
            SessionCommand::Goto(position - 1)
        }
        ("c", [name]) => SessionCommand::Criterion((*name).to_string()),
        _ => return Err(format!("unknown command {line:?}; h for help")),
    };
    Ok(command)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Enrich this many upcoming undecided records after each decision.
    pub enrich_ahead: usize,
}

/// Drives one queue against one engine until the reviewer quits.
pub struct ReviewSession<'a, E: ReviewEngine + ?Sized> {
    engine: &'a mut E,
    queue: DecisionQueue,
    options: SessionOptions,
}

impl<'a, E: ReviewEngine + ?Sized> ReviewSession<'a, E> {
    pub fn new(engine: &'a mut E, queue: DecisionQueue, options: SessionOptions) -> Self {
        Self {
            engine,
            queue,
            options,
        }
    }

    pub fn queue(&self) -> &DecisionQueue {
        &self.queue
    }

    pub fn run<R: BufRead, W: Write>(&mut self, input: R, output: &mut W) -> Result<QueueCounts> {
        self.render(output)?;
        for line in input.lines() {
            let line = line.context("read command")?;
            if line.trim().is_empty() {
                write!(output, "> ")?;
                output.flush()?;
                continue;
            }
            let keep_going = match parse_command(&line) {
                Ok(command) => self.execute(command, output)?,
                Err(message) => {
                    writeln!(output, "{message}")?;
                    true
                }
            };
            if !keep_going {
                break;
            }
            self.render(output)?;
        }
        let counts = self.queue.counts();
        writeln!(
            output,
            "{} session ended: included={} excluded={} undecided={}",
            self.queue.kind(),
            counts.included,
            counts.excluded,
            counts.undecided
        )?;
        Ok(counts)
    }

    fn execute<W: Write>(&mut self, command: SessionCommand, output: &mut W) -> Result<bool> {
        let result = match command {
            SessionCommand::Quit => return Ok(false),
            SessionCommand::Help => {
                writeln!(output, "{HELP}")?;
                Ok(())
            }
            SessionCommand::Decide(decision) => {
                let outcome = self.queue.decide_current(self.engine, decision).map(|_| ());
                if outcome.is_ok() {
                    self.after_decision(output)?;
                }
                outcome
            }
            SessionCommand::Accept => match self.queue.current_index() {
                Some(index) => {
                    let outcome = self.queue.decide_by_criteria(self.engine, index).map(|_| ());
                    if outcome.is_ok() {
                        self.after_decision(output)?;
                    }
                    outcome
                }
                None => Err(QueueError::QueueComplete),
            },
            SessionCommand::Next => self.step(1),
            SessionCommand::Previous => self.step(-1),
            SessionCommand::Goto(index) => self.queue.navigate(index),
            SessionCommand::Skip => {
                self.queue.skip_to_next_undecided();
                Ok(())
            }
            SessionCommand::Criterion(name) => match self.queue.current_index() {
                Some(index) => self.queue.toggle_criterion(index, &name).map(|_| ()),
                None => Err(QueueError::QueueComplete),
            },
            SessionCommand::Refresh => match self.queue.current_index() {
                Some(index) => match self.queue.refresh_record(self.engine, index) {
                    Ok(state) => {
                        let shown = state.map(|state| state.as_str()).unwrap_or("unknown");
                        writeln!(output, "engine status: {shown}")?;
                        Ok(())
                    }
                    Err(err) => Err(err),
                },
                None => Err(QueueError::QueueComplete),
            },
        };
        if let Err(err) = result {
            report_error(&err, output)?;
        }
        Ok(true)
    }

    fn step(&mut self, delta: isize) -> Result<(), QueueError> {
        let base = match self.queue.cursor() {
            Cursor::At(index) => index as isize,
            Cursor::Completion => self.queue.len() as isize,
        };
        let target = base + delta;
        if target < 0 {
            return Err(QueueError::IndexOutOfRange {
                index: 0,
                len: self.queue.len(),
            });
        }
        self.queue.navigate(target as usize)
    }

    // Enrichment may rewrite records it fetched before a decision landed,
    // so decided records are re-checked after every enrichment call.
    fn after_decision<W: Write>(&mut self, output: &mut W) -> Result<()> {
        if self.options.enrich_ahead == 0 {
            return Ok(());
        }
        let Some(start) = self.queue.current_index() else {
            return Ok(());
        };
        let records = self.queue.records();
        let upcoming: Vec<String> = records[start..]
            .iter()
            .chain(&records[..start])
            .filter(|record| !record.is_decided())
            .take(self.options.enrich_ahead)
            .map(|record| record.id().to_string())
            .collect();
        if upcoming.is_empty() {
            return Ok(());
        }
        match self.engine.batch_enrich_records(&upcoming) {
            Ok(report) => {
                tracing::debug!(
                    enriched = report.enriched_count,
                    failed = report.failed_count,
                    "enriched upcoming records"
                );
            }
            Err(err) => {
                tracing::warn!(error = %err, "enrichment failed");
                return Ok(());
            }
        }
        match self.queue.reassert_decisions(self.engine) {
            Ok(repaired) if !repaired.is_empty() => {
                writeln!(output, "re-applied {} reverted decision(s)", repaired.len())?;
            }
            Ok(_) => {}
            Err(err) => report_error(&err, output)?,
        }
        Ok(())
    }

    fn render<W: Write>(&self, output: &mut W) -> Result<()> {
        let queue = &self.queue;
        let counts = queue.counts();
        writeln!(output)?;
        writeln!(
            output,
            "{} {} included={} excluded={} undecided={}",
            queue.kind(),
            render_bar(&queue.progress(), queue.current_index()),
            counts.included,
            counts.excluded,
            counts.undecided
        )?;
        if let Some(remaining) = queue.remaining_hint() {
            writeln!(output, "engine reports {remaining} record(s) still waiting")?;
        } else if queue.total_count() > queue.len() as u64 {
            writeln!(
                output,
                "showing {} of {} waiting records",
                queue.len(),
                queue.total_count()
            )?;
        }

        let (Some(index), Some(record)) = (queue.current_index(), queue.current()) else {
            writeln!(output, "queue complete")?;
            write!(output, "> ")?;
            output.flush()?;
            return Ok(());
        };

        writeln!(output, "[{}/{}] {}", index + 1, queue.len(), record.id())?;
        let content = record.content();
        writeln!(output, "title: {}", content.title)?;
        if let Some(author) = &content.author {
            writeln!(output, "author: {author}")?;
        }
        if let Some(year) = &content.year {
            writeln!(output, "year: {year}")?;
        }
        if let Some(venue) = content.venue() {
            writeln!(output, "venue: {venue}")?;
        }
        if let Some(pdf) = &content.pdf_path {
            writeln!(output, "pdf: {pdf}")?;
        }
        if let Some(text) = &content.abstract_text {
            writeln!(output, "abstract: {}", preview(text, ABSTRACT_PREVIEW_CHARS))?;
        }

        if !queue.criteria().is_empty() {
            writeln!(output, "criteria:")?;
            for criterion in queue.criteria() {
                let mark = record
                    .criteria()
                    .get(&criterion.name)
                    .copied()
                    .unwrap_or_default();
                let kind = match criterion.kind {
                    crate::criteria::CriterionKind::Inclusion => "inclusion",
                    crate::criteria::CriterionKind::Exclusion => "exclusion",
                };
                writeln!(
                    output,
                    "  {} ({kind}): {} [{}]",
                    criterion.name,
                    criterion.label(mark),
                    mark
                )?;
            }
            if let Ok(outcome) = queue.criteria_outcome(index) {
                writeln!(output, "aggregate: {outcome}")?;
            }
        }

        if record.is_decided() {
            writeln!(
                output,
                "decided: {} (read-only; s skips to the next undecided record)",
                record.decision()
            )?;
        }
        write!(output, "> ")?;
        output.flush()?;
        Ok(())
    }
}

fn report_error<W: Write>(err: &QueueError, output: &mut W) -> Result<()> {
    writeln!(output, "error [{}]: {err}", err.class())?;
    match err.class() {
        ErrorClass::Stale => writeln!(output, "the record changed in the engine; r reloads it")?,
        ErrorClass::Transport => writeln!(output, "engine unavailable; try again")?,
        ErrorClass::Validation | ErrorClass::PartialBatch => {}
    }
    Ok(())
}

fn preview(text: &str, limit: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let cut: String = flat.chars().take(limit).collect();
    format!("{cut}...")
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
