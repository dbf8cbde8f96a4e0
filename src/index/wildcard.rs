//! Wildcard patterns for full-text queries.
//!
//! | Marker   | Matches                              |
//! |----------|--------------------------------------|
//! | `.`      | exactly one byte                     |
//! | `.?`     | zero or one byte                     |
//! | `.*`     | any number of bytes                  |
//! | `.+`     | at least one byte                    |
//! | `.{m,n}` | between `m` and `n` bytes (`n <= 255`) |
//! | `\x`     | the literal byte `x`                 |
//!
//! A malformed `{m,n}` quantifier leaves a single-byte `.` followed by
//! literal bytes. Patterns compile to a small byte automaton that the trie
//! walks one label byte at a time.

use memchr::{memchr, memchr2};

/// Largest repetition bound accepted in `.{m,n}`
pub const MAX_REPEAT: u32 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Lit(u8),
    Any { min: u32, max: Option<u32> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Lit(u8),
    One,
    Opt,
    Star,
}

/// Set of automaton states reached after some input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSet(Vec<u64>);

impl StateSet {
    fn with_states(n: usize) -> Self {
        StateSet(vec![0; n.div_ceil(64)])
    }

    #[inline]
    fn insert(&mut self, i: usize) {
        self.0[i / 64] |= 1 << (i % 64);
    }

    #[inline]
    fn contains(&self, i: usize) -> bool {
        self.0[i / 64] & (1 << (i % 64)) != 0
    }

    /// No further input can lead to a match
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }
}

#[derive(Debug, Clone)]
pub struct WildcardPattern {
    segments: Vec<Segment>,
    steps: Vec<Step>,
}

impl WildcardPattern {
    /// Whether `pattern` contains anything besides literal bytes
    pub fn has_wildcards(pattern: &[u8]) -> bool {
        memchr2(b'.', b'\\', pattern).is_some()
    }

    pub fn parse(pattern: &[u8]) -> Self {
        let mut segments = Vec::with_capacity(pattern.len());
        let mut i = 0;
        while i < pattern.len() {
            match pattern[i] {
                b'\\' => match pattern.get(i + 1) {
                    Some(&b) => {
                        segments.push(Segment::Lit(b));
                        i += 2;
                    }
                    None => {
                        segments.push(Segment::Lit(b'\\'));
                        i += 1;
                    }
                },
                b'.' => {
                    let (segment, used) = match pattern.get(i + 1) {
                        Some(b'?') => (Segment::Any { min: 0, max: Some(1) }, 2),
                        Some(b'*') => (Segment::Any { min: 0, max: None }, 2),
                        Some(b'+') => (Segment::Any { min: 1, max: None }, 2),
                        Some(b'{') => match parse_bounds(&pattern[i + 1..]) {
                            Some((min, max, len)) => (Segment::Any { min, max: Some(max) }, 1 + len),
                            None => (Segment::Any { min: 1, max: Some(1) }, 1),
                        },
                        _ => (Segment::Any { min: 1, max: Some(1) }, 1),
                    };
                    segments.push(segment);
                    i += used;
                }
                b => {
                    segments.push(Segment::Lit(b));
                    i += 1;
                }
            }
        }

        let mut steps = Vec::with_capacity(segments.len());
        for segment in &segments {
            match *segment {
                Segment::Lit(b) => steps.push(Step::Lit(b)),
                Segment::Any { min, max } => {
                    steps.extend(std::iter::repeat_n(Step::One, min as usize));
                    match max {
                        None => steps.push(Step::Star),
                        Some(max) => {
                            steps.extend(std::iter::repeat_n(Step::Opt, (max - min) as usize))
                        }
                    }
                }
            }
        }

        Self { segments, steps }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The pattern bytes if it contains no wildcard
    pub fn as_literal(&self) -> Option<Vec<u8>> {
        self.segments
            .iter()
            .map(|s| match s {
                Segment::Lit(b) => Some(*b),
                Segment::Any { .. } => None,
            })
            .collect()
    }

    /// Literal bytes before the first wildcard
    pub fn literal_prefix(&self) -> Vec<u8> {
        self.segments
            .iter()
            .map_while(|s| match s {
                Segment::Lit(b) => Some(*b),
                Segment::Any { .. } => None,
            })
            .collect()
    }

    /// Shortest matching token length
    pub fn min_len(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s, Step::Lit(_) | Step::One))
            .count()
    }

    /// Longest matching token length, `None` if unbounded
    pub fn max_len(&self) -> Option<usize> {
        if self.steps.contains(&Step::Star) {
            None
        } else {
            Some(self.steps.len())
        }
    }

    pub fn start(&self) -> StateSet {
        let mut states = StateSet::with_states(self.steps.len() + 1);
        states.insert(0);
        self.close(&mut states);
        states
    }

    /// Follow skippable steps
    fn close(&self, states: &mut StateSet) {
        for (i, step) in self.steps.iter().enumerate() {
            if matches!(step, Step::Opt | Step::Star) && states.contains(i) {
                states.insert(i + 1);
            }
        }
    }

    pub fn advance(&self, states: &StateSet, byte: u8) -> StateSet {
        let mut next = StateSet::with_states(self.steps.len() + 1);
        for (i, step) in self.steps.iter().enumerate() {
            if !states.contains(i) {
                continue;
            }
            match *step {
                Step::Lit(b) if b == byte => next.insert(i + 1),
                Step::Lit(_) => {}
                Step::One | Step::Opt => next.insert(i + 1),
                Step::Star => next.insert(i),
            }
        }
        self.close(&mut next);
        next
    }

    pub fn accepts(&self, states: &StateSet) -> bool {
        states.contains(self.steps.len())
    }

    pub fn matches(&self, token: &[u8]) -> bool {
        let mut states = self.start();
        for &b in token {
            states = self.advance(&states, b);
            if states.is_empty() {
                return false;
            }
        }
        self.accepts(&states)
    }

    /// Equivalent anchored byte regex
    pub fn to_regex(&self) -> String {
        let mut re = String::from("(?s-u)^");
        for segment in &self.segments {
            match *segment {
                Segment::Lit(b) if b.is_ascii_alphanumeric() => re.push(b as char),
                Segment::Lit(b) => re.push_str(&format!("\\x{:02X}", b)),
                Segment::Any { min, max: Some(max) } => re.push_str(&format!(".{{{},{}}}", min, max)),
                Segment::Any { min, max: None } => re.push_str(&format!(".{{{},}}", min)),
            }
        }
        re.push('$');
        re
    }
}

/// Parse `{m,n}` at the start of `s`; returns the bounds and bytes consumed
fn parse_bounds(s: &[u8]) -> Option<(u32, u32, usize)> {
    let close = memchr(b'}', s)?;
    let inner = &s[1..close];
    let comma = memchr(b',', inner)?;
    let min = parse_number(&inner[..comma])?;
    let max = parse_number(&inner[comma + 1..])?;
    (min <= max && max <= MAX_REPEAT).then_some((min, max, close + 1))
}

fn parse_number(digits: &[u8]) -> Option<u32> {
    if digits.is_empty() || digits.len() > 3 || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0u32, |acc, &d| acc.checked_mul(10)?.checked_add((d - b'0') as u32))
}
