use std::marker::PhantomData;

use tracing::debug;

use crate::claude_code::ClaudeCode;
use crate::codex::Codex;
use crate::config::ParsePolicy;
use crate::decode::{DecodeContext, Decoded, RecordDecoder};
use crate::error::MalformedLineError;
use crate::execution::ExecOutput;
use crate::fold::{Accumulator, AgentGrammar};
use crate::line_buffer::split_lines;
use crate::opencode::OpenCode;
use crate::record::DecodedRecord;
use crate::response::{AgentKind, AgentResponse};
use crate::sink::{NullSink, StreamSink};

/// Decode, classify and fold, shared by the live and authoritative paths.
pub(crate) struct Pipeline<G: AgentGrammar> {
    decoder: RecordDecoder,
    acc: Accumulator<G::State>,
    records: Option<Vec<DecodedRecord>>,
    _grammar: PhantomData<G>,
}

impl<G: AgentGrammar> Pipeline<G> {
    pub(crate) fn new(policy: ParsePolicy, retain_records: bool) -> Self {
        Self {
            decoder: RecordDecoder::new(policy),
            acc: Accumulator::default(),
            records: retain_records.then(Vec::new),
            _grammar: PhantomData,
        }
    }

    pub(crate) fn accumulator(&self) -> &Accumulator<G::State> {
        &self.acc
    }

    pub(crate) fn decoder(&self) -> &RecordDecoder {
        &self.decoder
    }

    pub(crate) fn ingest(
        &mut self,
        line: &str,
        context: &DecodeContext,
        sink: &mut dyn StreamSink,
    ) -> Result<(), MalformedLineError> {
        let records = match self.decoder.decode(line, context)? {
            Decoded::Records(records) => records,
            Decoded::Skipped => return Ok(()),
        };
        for record in records {
            let event = G::classify(&record);
            G::fold(&mut self.acc, event, &mut *sink);
            if let Some(kept) = self.records.as_mut() {
                kept.push(record);
            }
        }
        Ok(())
    }

    pub(crate) fn into_response(mut self, exit_code: i32) -> AgentResponse {
        G::finish(&mut self.acc);
        let (parse_failure_count, parse_failure_samples) = self.decoder.into_failures().into_parts();
        let parts = self.acc.into_parts();
        AgentResponse {
            agent_kind: G::KIND,
            text: parts.text,
            exit_code,
            session_id: parts.session_id,
            message_id: parts.message_id,
            usage: parts.usage,
            cost: parts.cost,
            tool_calls: parts.tool_calls,
            stream_errors: parts.stream_errors,
            decoded: self.records.unwrap_or_default(),
            parse_failure_count,
            parse_failure_samples,
        }
    }
}

/// Authoritative parse of a complete captured stdout.
///
/// Lines are numbered from 1, counting blank lines, so diagnostics point at the real line.
pub fn parse_stdout<G: AgentGrammar>(
    stdout: &str,
    exit_code: i32,
    policy: ParsePolicy,
) -> Result<AgentResponse, MalformedLineError> {
    let mut pipeline = Pipeline::<G>::new(policy, true);
    let mut sink = NullSink;
    for (index, line) in split_lines(stdout).enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let context = DecodeContext::Output {
            agent: G::KIND,
            line_number: index + 1,
        };
        pipeline.ingest(line, &context, &mut sink)?;
    }
    let response = pipeline.into_response(exit_code);
    debug!(
        agent = %G::KIND,
        exit_code,
        records = response.decoded().len(),
        tool_calls = response.tool_calls().len(),
        parse_failures = response.parse_failure_count(),
        "parsed agent output"
    );
    Ok(response)
}

pub fn parse_output<G: AgentGrammar>(
    output: &ExecOutput,
    policy: ParsePolicy,
) -> Result<AgentResponse, MalformedLineError> {
    parse_stdout::<G>(&output.stdout, output.exit_code, policy)
}

/// [`parse_output`] with the grammar picked at runtime.
pub fn parse_agent_output(
    kind: AgentKind,
    output: &ExecOutput,
    policy: ParsePolicy,
) -> Result<AgentResponse, MalformedLineError> {
    match kind {
        AgentKind::ClaudeCode => parse_output::<ClaudeCode>(output, policy),
        AgentKind::Codex => parse_output::<Codex>(output, policy),
        AgentKind::OpenCode => parse_output::<OpenCode>(output, policy),
    }
}
