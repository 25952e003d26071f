//! Terminal rendering of conversation snapshots.
//!
//! Snapshots are complete, so the renderer remembers how much of each
//! message it has already printed and only writes what is new.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use sovereign::conversation::{ConversationMessage, MessageContent, MessageId, Sender};
use sovereign::event::ChartPayload;
use sovereign::session::Snapshot;

const MIN_COLUMN_WIDTH: usize = 10;

#[derive(Debug, Default)]
pub struct Renderer {
    printed_steps: HashMap<MessageId, usize>,
    finished: HashSet<MessageId>,
}

impl Renderer {
    /// Forget what has been printed, after the conversation is reset.
    pub fn reset(&mut self) {
        self.printed_steps.clear();
        self.finished.clear();
    }

    /// Print new thinking steps and any answer that has just completed.
    pub fn render(&mut self, snapshot: &Snapshot, out: &mut impl Write) -> io::Result<()> {
        for message in snapshot.conversation.messages() {
            if message.sender != Sender::Assistant || self.finished.contains(&message.id) {
                continue;
            }

            let printed = self.printed_steps.entry(message.id).or_default();
            for step in &message.thinking_steps[*printed..] {
                writeln!(out, "  · {step}")?;
            }
            *printed = message.thinking_steps.len();

            if message.is_done {
                if !message.content.is_empty() {
                    writeln!(out)?;
                    write_content(message, out)?;
                    writeln!(out)?;
                }
                self.finished.insert(message.id);
            }
        }
        out.flush()
    }

    /// Print a message's thinking steps in full, or a one-line summary when
    /// they are collapsed.
    pub fn show_steps(&self, message: &ConversationMessage, out: &mut impl Write) -> io::Result<()> {
        let count = message.thinking_steps.len();
        if !message.is_thinking_open {
            writeln!(out, "({count} steps hidden)")?;
            return out.flush();
        }
        if count == 0 {
            writeln!(out, "(no steps)")?;
        }
        for (i, step) in message.thinking_steps.iter().enumerate() {
            writeln!(out, "  {}. {step}", i + 1)?;
        }
        out.flush()
    }
}

fn write_content(message: &ConversationMessage, out: &mut impl Write) -> io::Result<()> {
    match &message.content {
        MessageContent::Text(text) if message.is_error => writeln!(out, "! {text}"),
        MessageContent::Text(text) => writeln!(out, "{text}"),
        MessageContent::Chart(chart) => write_chart(chart, out),
        MessageContent::Empty => Ok(()),
    }
}

/// Render a chart as a table: one row per label, one column per dataset.
fn write_chart(chart: &ChartPayload, out: &mut impl Write) -> io::Result<()> {
    if !chart.title.is_empty() {
        writeln!(out, "{}", chart.title)?;
    }

    let label_width = chart
        .labels
        .iter()
        .map(|label| label.chars().count())
        .max()
        .unwrap_or(0);
    let widths: Vec<usize> = chart
        .datasets
        .iter()
        .map(|dataset| dataset.name.chars().count().max(MIN_COLUMN_WIDTH))
        .collect();

    write!(out, "{:label_width$}", "")?;
    for (dataset, &width) in chart.datasets.iter().zip(&widths) {
        write!(out, "  {:>width$}", dataset.name)?;
    }
    writeln!(out)?;

    for (label, values) in chart.rows() {
        write!(out, "{label:<label_width$}")?;
        for (value, &width) in values.iter().zip(&widths) {
            match value {
                Some(v) => write!(out, "  {v:>width$.2}")?,
                None => write!(out, "  {:>width$}", "-")?,
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
