use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::config::{ParsePolicy, MAX_PARSE_FAILURE_SAMPLES, PARSE_FAILURE_SAMPLE_CHARS};
use crate::error::MalformedLineError;
use crate::record::DecodedRecord;
use crate::response::AgentKind;

/// Where a line came from; rendered into [`MalformedLineError::context`].
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeContext {
    /// Live chunk delivery while the process runs.
    Stream { agent: AgentKind },
    /// Authoritative re-parse of captured stdout; `line_number` is 1-based.
    Output { agent: AgentKind, line_number: usize },
}

impl DecodeContext {
    pub fn agent(&self) -> AgentKind {
        match self {
            Self::Stream { agent } | Self::Output { agent, .. } => *agent,
        }
    }
}

impl fmt::Display for DecodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { agent } => write!(f, "{} stream JSON line", agent.display_name()),
            Self::Output { agent, line_number } => write!(
                f,
                "Failed to parse {} {} line {}",
                agent.display_name(),
                agent.output_format(),
                line_number
            ),
        }
    }
}

/// Count of malformed payloads plus the first few samples.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ParseFailures {
    count: usize,
    samples: Vec<String>,
}

impl ParseFailures {
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn into_parts(self) -> (usize, Vec<String>) {
        (self.count, self.samples)
    }

    fn record(&mut self, sample: &str) {
        self.count += 1;
        if self.samples.len() < MAX_PARSE_FAILURE_SAMPLES {
            self.samples.push(sample.to_string());
        }
    }
}

/// Result of decoding one non-blank line.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// One record for an object line, one per object element for an array line.
    Records(Vec<DecodedRecord>),
    /// Malformed under a lenient policy; already counted.
    Skipped,
}

/// Turns trimmed lines into [`DecodedRecord`]s under a fixed [`ParsePolicy`].
#[derive(Debug, Clone)]
pub struct RecordDecoder {
    policy: ParsePolicy,
    failures: ParseFailures,
}

impl RecordDecoder {
    pub fn new(policy: ParsePolicy) -> Self {
        Self {
            policy,
            failures: ParseFailures::default(),
        }
    }

    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    pub fn failures(&self) -> &ParseFailures {
        &self.failures
    }

    pub fn into_failures(self) -> ParseFailures {
        self.failures
    }

    pub fn decode(
        &mut self,
        line: &str,
        context: &DecodeContext,
    ) -> Result<Decoded, MalformedLineError> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(err) => return self.skip(context, &err.to_string(), line),
        };
        match value {
            Value::Object(map) => Ok(Decoded::Records(vec![DecodedRecord::new(map)])),
            Value::Array(entries) => {
                if !entries.iter().all(Value::is_object) {
                    return self.skip(context, "expected JSON object entries", line);
                }
                let records = entries
                    .into_iter()
                    .filter_map(|entry| match entry {
                        Value::Object(map) => Some(DecodedRecord::new(map)),
                        _ => None,
                    })
                    .collect();
                Ok(Decoded::Records(records))
            }
            _ => self.skip(context, "expected JSON object or array", line),
        }
    }

    fn skip(
        &mut self,
        context: &DecodeContext,
        reason: &str,
        payload: &str,
    ) -> Result<Decoded, MalformedLineError> {
        self.fail(context, reason, payload)?;
        Ok(Decoded::Skipped)
    }

    fn fail(
        &mut self,
        context: &DecodeContext,
        reason: &str,
        payload: &str,
    ) -> Result<(), MalformedLineError> {
        let sample = sample_payload(payload);
        self.failures.record(&sample);
        if self.policy.fail_fast {
            return Err(MalformedLineError {
                context: context.to_string(),
                reason: reason.to_string(),
                payload: sample,
            });
        }
        debug!(context = %context, reason, "skipping malformed agent output");
        Ok(())
    }
}

fn sample_payload(payload: &str) -> String {
    payload.trim().chars().take(PARSE_FAILURE_SAMPLE_CHARS).collect()
}
