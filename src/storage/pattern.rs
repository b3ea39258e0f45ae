//! Shell-style glob matching for `KEYS`.
//!
//! Supported syntax:
//! - `*` matches any run of bytes, including none
//! - `?` matches exactly one byte
//! - `[abc]`, `[a-z]` match one byte from the class; `[^...]` negates it
//! - `\x` matches `x` literally
//!
//! Matching is byte-wise so binary keys work. A malformed class (no closing
//! `]`) never matches.

/// A compiled glob pattern, matched in `O(pattern * text)` time.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: Vec<u8>,
}

impl GlobPattern {
    pub fn new(pattern: impl AsRef<[u8]>) -> Self {
        Self {
            pattern: pattern.as_ref().to_vec(),
        }
    }

    /// Returns true if `text` matches the whole pattern.
    pub fn matches(&self, text: &[u8]) -> bool {
        match_from(&self.pattern, text)
    }
}

/// Iterative matcher that remembers only the most recent `*`.
///
/// On a mismatch it retries from that star with one more text byte
/// consumed, so the number of steps is bounded by `pattern.len() * text.len()`
/// and the stack depth is constant.
fn match_from(pattern: &[u8], text: &[u8]) -> bool {
    let mut pi = 0;
    let mut ti = 0;

    // (pattern index of the last '*', text index it is currently matched up to)
    let mut star: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() {
            let byte = text[ti];
            let step = match pattern[pi] {
                b'*' => {
                    star = Some((pi, ti));
                    pi += 1;
                    continue;
                }
                b'?' => Some(1),
                b'[' => match match_class(&pattern[pi + 1..], byte) {
                    Some((true, class_len)) => Some(1 + class_len),
                    Some((false, _)) => None,
                    // An unterminated class can never be consumed.
                    None => return false,
                },
                b'\\' if pi + 1 < pattern.len() => (pattern[pi + 1] == byte).then_some(2),
                literal => (literal == byte).then_some(1),
            };

            if let Some(step) = step {
                pi += step;
                ti += 1;
                continue;
            }
        }

        match star {
            Some((star_pi, star_ti)) => {
                pi = star_pi + 1;
                ti = star_ti + 1;
                star = Some((star_pi, ti));
            }
            None => return false,
        }
    }

    pattern[pi..].iter().all(|&b| b == b'*')
}

/// Evaluates a character class starting just after `[`.
///
/// Returns whether `byte` is in the class and how many pattern bytes the
/// class occupied including the closing `]`, or `None` if it never closes.
fn match_class(class: &[u8], byte: u8) -> Option<(bool, usize)> {
    let mut i = 0;
    let negate = class.first() == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < class.len() && class[i] != b']' {
        let mut low = class[i];
        if low == b'\\' && i + 1 < class.len() {
            i += 1;
            low = class[i];
        }

        if i + 2 < class.len() && class[i + 1] == b'-' && class[i + 2] != b']' {
            let high = class[i + 2];
            let (low, high) = if low <= high { (low, high) } else { (high, low) };
            if (low..=high).contains(&byte) {
                matched = true;
            }
            i += 3;
        } else {
            if low == byte {
                matched = true;
            }
            i += 1;
        }
    }

    if i >= class.len() {
        return None;
    }

    Some((matched != negate, i + 1))
}
