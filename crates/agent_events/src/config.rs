/// Number of malformed payload samples kept on a response (first come, first kept).
pub const MAX_PARSE_FAILURE_SAMPLES: usize = 3;

/// Characters of a trimmed malformed payload kept per sample.
pub const PARSE_FAILURE_SAMPLE_CHARS: usize = 200;

/// Controls what happens when a line is not a JSON object or array.
///
/// Fixed for the lifetime of a parser; there is no way to flip it mid-parse.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ParsePolicy {
    /// `true`: the first malformed line aborts the parse with a [`crate::MalformedLineError`].
    /// `false`: malformed lines are counted, sampled, and skipped.
    pub fail_fast: bool,
}

impl ParsePolicy {
    pub const fn strict() -> Self {
        Self { fail_fast: true }
    }

    pub const fn lenient() -> Self {
        Self { fail_fast: false }
    }
}

impl Default for ParsePolicy {
    fn default() -> Self {
        Self::strict()
    }
}
