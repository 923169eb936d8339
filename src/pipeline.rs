// src/pipeline.rs
use crate::aggregator::{Aggregator, Table};
use crate::error::ProcessingError;
use crate::explain::Explainer;
use crate::extractor::{extract, Record};
use crate::merge::MergedLine;
use crate::rules::{BlockMarkers, BlockStartPolicy, RuleSet};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Configuration for pipeline behavior
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub print_tag_in_output: bool,
    pub error_strategy: ErrorStrategy,
    pub buffer_size: usize,
    pub max_line_length: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            print_tag_in_output: false,
            error_strategy: ErrorStrategy::Skip,
            buffer_size: 65536,       // 64KB
            max_line_length: 1048576, // 1MB
        }
    }
}

/// Simple error handling strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStrategy {
    /// Skip problematic lines and continue processing
    Skip,
    /// Stop processing on first error
    FailFast,
}

/// Runtime statistics
#[derive(Debug, Default, Clone)]
pub struct ProcessingStats {
    pub lines_read: usize,
    pub lines_matched: usize,
    pub lines_unmatched: usize,
    /// Matched lines where no element could be located
    pub lines_without_fields: usize,
    pub lines_too_long: usize,
    pub records_emitted: usize,
    /// Unfinished blocks thrown away by a block-start line
    pub blocks_discarded: usize,
    /// Blocks still open when the input ended
    pub unterminated_blocks: usize,
    pub processing_time: Duration,
}

/// A record ready for aggregation, with the index of its group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Emitted {
    pub group: usize,
    pub record: Record,
}

/// Result of a full run
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub tables: Vec<Table>,
    pub stats: ProcessingStats,
}

/// Accumulates fields across the lines of one block
#[derive(Debug, Default)]
struct BlockTracker {
    pending: Option<Record>,
}

#[derive(Debug, Default)]
struct BlockStep {
    flushed: Option<Record>,
    discarded: bool,
}

impl BlockTracker {
    /// Feed one line dispatched to the tracker's group.
    ///
    /// `tag` is the tag of the rule that matched the line; a flushed record
    /// carries the tag of the line that ended its block.
    fn push(
        &mut self,
        markers: &BlockMarkers,
        line: &str,
        tag: &str,
        record: Option<Record>,
    ) -> BlockStep {
        let mut step = BlockStep::default();

        if markers.policy == BlockStartPolicy::Reset && markers.is_start(line) {
            step.discarded = self.pending.take().is_some();
        }

        if let Some(record) = record {
            match &mut self.pending {
                Some(pending) => pending.absorb(record),
                None => self.pending = Some(record),
            }
        }

        if markers.is_end(line) {
            step.flushed = self.pending.take().map(|mut record| {
                record.tag = tag.to_string();
                record
            });
        }

        step
    }

    fn is_open(&self) -> bool {
        self.pending.is_some()
    }
}

/// Turns merged lines into records: dispatch, extraction and block tracking
pub struct Pipeline<'r> {
    rules: &'r RuleSet,
    config: PipelineConfig,
    blocks: Vec<BlockTracker>,
    stats: ProcessingStats,
}

impl<'r> Pipeline<'r> {
    pub fn new(rules: &'r RuleSet, config: PipelineConfig) -> Self {
        Pipeline {
            rules,
            config,
            blocks: rules.groups().iter().map(|_| BlockTracker::default()).collect(),
            stats: ProcessingStats::default(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> &ProcessingStats {
        &self.stats
    }

    /// Lazily pull lines and yield records as they complete
    pub fn records<'p, I>(&'p mut self, lines: I) -> Records<'p, 'r, I>
    where
        I: Iterator<Item = MergedLine>,
    {
        Records {
            pipeline: self,
            lines,
            explainer: None,
            started: Instant::now(),
            finished: false,
        }
    }

    /// Drain all lines into per-group tables
    pub fn run<I>(&mut self, lines: I) -> Result<RunOutput, ProcessingError>
    where
        I: Iterator<Item = MergedLine>,
    {
        let records = self.records(lines);
        Self::aggregate(records)
    }

    /// Like [`Pipeline::run`], describing every matched line that yields fields to the explainer
    pub fn run_explained<I>(
        &mut self,
        lines: I,
        explainer: Explainer<'_>,
    ) -> Result<RunOutput, ProcessingError>
    where
        I: Iterator<Item = MergedLine>,
    {
        let records = self.records(lines).with_explainer(explainer);
        Self::aggregate(records)
    }

    fn aggregate<I>(mut records: Records<'_, 'r, I>) -> Result<RunOutput, ProcessingError>
    where
        I: Iterator<Item = MergedLine>,
    {
        let mut aggregator = Aggregator::new(
            records.pipeline.rules,
            records.pipeline.config.print_tag_in_output,
        );

        for emitted in records.by_ref() {
            let emitted = emitted?;
            aggregator.add(emitted.group, &emitted.record);
        }

        let stats = records.pipeline.stats.clone();
        info!(
            lines = stats.lines_read,
            matched = stats.lines_matched,
            rows = aggregator.row_count(),
            "processing finished"
        );

        Ok(RunOutput {
            tables: aggregator.into_tables(),
            stats,
        })
    }

    fn process_line(
        &mut self,
        line: &MergedLine,
        explainer: Option<&mut Explainer<'_>>,
    ) -> Result<Option<Emitted>, ProcessingError> {
        self.stats.lines_read += 1;

        if line.text.len() > self.config.max_line_length {
            let error = ProcessingError::LineTooLong {
                source_index: line.source,
                line_number: line.line_number,
                length: line.text.len(),
                max_length: self.config.max_line_length,
            };
            match self.config.error_strategy {
                ErrorStrategy::FailFast => return Err(error),
                ErrorStrategy::Skip => {
                    self.stats.lines_too_long += 1;
                    debug!("{}, skipping", error);
                    return Ok(None);
                }
            }
        }

        let rules = self.rules;
        let Some(at) = rules.dispatch(&line.text) else {
            self.stats.lines_unmatched += 1;
            return Ok(None);
        };
        let (Some(group), Some(rule)) = (rules.group(at.group), rules.rule(at)) else {
            return Ok(None);
        };
        self.stats.lines_matched += 1;

        let record = extract(&line.text, rule);
        match (&record, explainer) {
            (None, _) => {
                self.stats.lines_without_fields += 1;
                debug!(
                    source = line.source,
                    line = line.line_number,
                    tag = %rule.tag,
                    "matched line has none of its elements"
                );
            }
            (Some(_), Some(explainer)) => explainer.explain_line(line, rule)?,
            (Some(_), None) => {}
        }

        let record = match &group.block {
            None => record,
            Some(markers) => {
                let step = self.blocks[at.group].push(markers, &line.text, &rule.tag, record);
                if step.discarded {
                    self.stats.blocks_discarded += 1;
                    debug!(
                        group = %group.id,
                        line = line.line_number,
                        "block start discarded an unfinished block"
                    );
                }
                step.flushed
            }
        };

        Ok(record.map(|record| {
            self.stats.records_emitted += 1;
            Emitted {
                group: at.group,
                record,
            }
        }))
    }

    fn finish(&mut self, elapsed: Duration) {
        for (tracker, group) in self.blocks.iter_mut().zip(self.rules.groups()) {
            if tracker.is_open() {
                self.stats.unterminated_blocks += 1;
                debug!(group = %group.id, "input ended inside a block, discarding it");
                tracker.pending = None;
            }
        }
        self.stats.processing_time += elapsed;
    }
}

/// Pull-based record stream returned by [`Pipeline::records`]
pub struct Records<'p, 'r, I> {
    pipeline: &'p mut Pipeline<'r>,
    lines: I,
    explainer: Option<Explainer<'p>>,
    started: Instant,
    finished: bool,
}

impl<'p, 'r, I> Records<'p, 'r, I> {
    pub fn with_explainer(mut self, explainer: Explainer<'p>) -> Self {
        self.explainer = Some(explainer);
        self
    }
}

impl<I> Iterator for Records<'_, '_, I>
where
    I: Iterator<Item = MergedLine>,
{
    type Item = Result<Emitted, ProcessingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        for line in self.lines.by_ref() {
            match self.pipeline.process_line(&line, self.explainer.as_mut()) {
                Ok(Some(emitted)) => return Some(Ok(emitted)),
                Ok(None) => continue,
                Err(e) => {
                    self.finished = true;
                    return Some(Err(e));
                }
            }
        }

        self.finished = true;
        self.pipeline.finish(self.started.elapsed());
        None
    }
}
