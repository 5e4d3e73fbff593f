//! Reversible text deltas and their storage encoding.
//!
//! A [`Delta`] is an edit script of `Retain` / `Insert` / `Delete` spans over
//! Unicode scalar values. Deletions carry the removed text, so swapping
//! inserts and deletes ([`Delta::reverse`]) yields a delta that undoes the
//! original exactly. Retained spans are stored as counts only; both ends of
//! the transition are pinned by a [`TextFingerprint`] (length + checksum) so
//! a delta applied to the wrong text fails instead of producing garbage.
//!
//! Storage format:
//! ```text
//! ┌──────────────────────┬──────────────────────────────────────────┐
//! │ uncompressed size    │ LZ4 block( bincode( Delta ) )            │
//! │ 4 bytes LE           │ variable                                 │
//! └──────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Diffing is Myers' O(ND) greedy algorithm, run on the span left after
//! trimming the common prefix and suffix. The search is capped by an edit
//! budget; past it the remaining middle is emitted as one delete plus one
//! insert, which is still exact but no longer minimal.
//!
//! Reference: Myers, "An O(ND) Difference Algorithm and Its Variations" (1986)

use serde::{Deserialize, Serialize};

/// Default cap on the number of insert/delete steps the diff search explores.
pub const DEFAULT_EDIT_BUDGET: usize = 2_000;

/// Marks a diagonal the search has not reached yet.
const UNREACHED: isize = -1;

/// One span of an edit script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edit {
    /// Keep this many characters unchanged
    Retain(usize),
    /// Insert this text at the cursor
    Insert(String),
    /// Remove this text at the cursor (must match exactly)
    Delete(String),
}

/// Length and checksum of a text, pinned to each side of a delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFingerprint {
    /// Length in Unicode scalar values
    pub chars: usize,
    /// FNV-1a over the UTF-8 bytes
    pub checksum: u32,
}

impl TextFingerprint {
    pub fn of(text: &str) -> Self {
        let mut hash: u32 = 0x811c_9dc5; // FNV offset basis
        for byte in text.as_bytes() {
            hash ^= *byte as u32;
            hash = hash.wrapping_mul(0x0100_0193); // FNV prime
        }
        Self {
            chars: text.chars().count(),
            checksum: hash,
        }
    }
}

/// A reversible edit script transforming a source text into a target text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    edits: Vec<Edit>,
    source: TextFingerprint,
    target: TextFingerprint,
}

impl Delta {
    /// The edit spans, in cursor order.
    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    /// Fingerprint of the text this delta applies to.
    pub fn source(&self) -> TextFingerprint {
        self.source
    }

    /// Fingerprint of the text this delta produces.
    pub fn target(&self) -> TextFingerprint {
        self.target
    }

    /// True if applying the delta changes nothing.
    pub fn is_noop(&self) -> bool {
        self.edits.iter().all(|e| matches!(e, Edit::Retain(_)))
    }

    /// Number of characters inserted.
    pub fn inserted_chars(&self) -> usize {
        self.edits
            .iter()
            .map(|e| match e {
                Edit::Insert(s) => s.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Number of characters deleted.
    pub fn deleted_chars(&self) -> usize {
        self.edits
            .iter()
            .map(|e| match e {
                Edit::Delete(s) => s.chars().count(),
                _ => 0,
            })
            .sum()
    }

    /// Swap inserts and deletes so the delta maps target back to source.
    pub fn reverse(&self) -> Delta {
        let edits = self
            .edits
            .iter()
            .map(|e| match e {
                Edit::Retain(n) => Edit::Retain(*n),
                Edit::Insert(s) => Edit::Delete(s.clone()),
                Edit::Delete(s) => Edit::Insert(s.clone()),
            })
            .collect();
        Delta {
            edits,
            source: self.target,
            target: self.source,
        }
    }

    /// Apply the delta to `text`.
    ///
    /// Fails if `text` is not the source this delta was computed from, or if
    /// the result does not match the recorded target.
    pub fn apply(&self, text: &str) -> Result<String, PatchError> {
        let actual = TextFingerprint::of(text);
        if actual != self.source {
            return Err(PatchError::SourceMismatch {
                expected: self.source,
                actual,
            });
        }

        let chars: Vec<char> = text.chars().collect();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0usize;

        for edit in &self.edits {
            match edit {
                Edit::Retain(n) => {
                    let end = cursor
                        .checked_add(*n)
                        .filter(|end| *end <= chars.len())
                        .ok_or(PatchError::LengthMismatch {
                            expected: cursor.saturating_add(*n),
                            actual: chars.len(),
                        })?;
                    out.extend(&chars[cursor..end]);
                    cursor = end;
                }
                Edit::Insert(s) => out.push_str(s),
                Edit::Delete(s) => {
                    for expected in s.chars() {
                        match chars.get(cursor) {
                            Some(c) if *c == expected => cursor += 1,
                            _ => return Err(PatchError::ContextMismatch { offset: cursor }),
                        }
                    }
                }
            }
        }

        if cursor != chars.len() {
            return Err(PatchError::LengthMismatch {
                expected: cursor,
                actual: chars.len(),
            });
        }

        let produced = TextFingerprint::of(&out);
        if produced != self.target {
            return Err(PatchError::TargetMismatch {
                expected: self.target,
                actual: produced,
            });
        }
        Ok(out)
    }
}

/// Serialized, LZ4-compressed delta as persisted on a revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchBlob(Vec<u8>);

impl PatchBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Stored size in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Patch codec errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchError {
    /// Input text is not the text the delta was computed from
    SourceMismatch {
        expected: TextFingerprint,
        actual: TextFingerprint,
    },
    /// A deleted span does not match the text at the cursor
    ContextMismatch { offset: usize },
    /// Delta does not consume the input exactly
    LengthMismatch { expected: usize, actual: usize },
    /// Output does not match the recorded target
    TargetMismatch {
        expected: TextFingerprint,
        actual: TextFingerprint,
    },
    /// bincode encoding failed
    Encode(String),
    /// bincode decoding failed
    Decode(String),
    /// LZ4 decompression failed
    Decompress(String),
}

impl std::fmt::Display for PatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatchError::SourceMismatch { expected, actual } => write!(
                f,
                "Patch source mismatch: expected {} chars (checksum {:08x}), got {} chars (checksum {:08x})",
                expected.chars, expected.checksum, actual.chars, actual.checksum
            ),
            PatchError::ContextMismatch { offset } => {
                write!(f, "Patch context mismatch at char offset {offset}")
            }
            PatchError::LengthMismatch { expected, actual } => {
                write!(f, "Patch length mismatch: expected {expected} chars, got {actual}")
            }
            PatchError::TargetMismatch { expected, actual } => write!(
                f,
                "Patch target mismatch: expected checksum {:08x}, got {:08x}",
                expected.checksum, actual.checksum
            ),
            PatchError::Encode(e) => write!(f, "Patch encode error: {e}"),
            PatchError::Decode(e) => write!(f, "Patch decode error: {e}"),
            PatchError::Decompress(e) => write!(f, "Patch decompression failed: {e}"),
        }
    }
}

impl std::error::Error for PatchError {}

/// Compute the delta turning `old` into `new` with the default edit budget.
pub fn diff(old: &str, new: &str) -> Delta {
    diff_with_budget(old, new, DEFAULT_EDIT_BUDGET)
}

/// Compute the delta turning `old` into `new`, exploring at most `budget`
/// insert/delete steps before falling back to a replace of the middle span.
pub fn diff_with_budget(old: &str, new: &str, budget: usize) -> Delta {
    let a: Vec<char> = old.chars().collect();
    let b: Vec<char> = new.chars().collect();

    let prefix = a.iter().zip(&b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let mut builder = DeltaBuilder::default();
    builder.retain(prefix);
    match myers(a_mid, b_mid, budget) {
        Some(ops) => {
            for op in ops {
                match op {
                    Op::Equal(n) => builder.retain(n),
                    Op::Delete(i) => builder.delete(a_mid[i]),
                    Op::Insert(j) => builder.insert(b_mid[j]),
                }
            }
        }
        None => {
            log::debug!(
                "diff budget of {budget} exhausted ({} -> {} chars), emitting replace",
                a_mid.len(),
                b_mid.len()
            );
            a_mid.iter().for_each(|c| builder.delete(*c));
            b_mid.iter().for_each(|c| builder.insert(*c));
        }
    }
    builder.retain(suffix);

    Delta {
        edits: builder.finish(),
        source: TextFingerprint::of(old),
        target: TextFingerprint::of(new),
    }
}

/// Serialize a delta into its storage blob.
pub fn to_patch(delta: &Delta) -> Result<PatchBlob, PatchError> {
    let encoded = bincode::serde::encode_to_vec(delta, bincode::config::standard())
        .map_err(|e| PatchError::Encode(e.to_string()))?;
    Ok(PatchBlob(lz4_flex::compress_prepend_size(&encoded)))
}

/// Deserialize a storage blob back into a delta.
pub fn from_patch(blob: &PatchBlob) -> Result<Delta, PatchError> {
    let encoded = lz4_flex::decompress_size_prepended(&blob.0)
        .map_err(|e| PatchError::Decompress(e.to_string()))?;
    let (delta, _): (Delta, _) =
        bincode::serde::decode_from_slice(&encoded, bincode::config::standard())
            .map_err(|e| PatchError::Decode(e.to_string()))?;
    Ok(delta)
}

// ─── Myers search ────────────────────────────────────────────────────────

/// Primitive step of the raw script, indexing into the trimmed inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal(usize),
    Delete(usize),
    Insert(usize),
}

/// How the furthest point on a diagonal was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Kept from two rounds earlier (fewer edits, same diagonal)
    Stay,
    /// Insert: moved down from diagonal k+1
    Down,
    /// Delete: moved right from diagonal k-1
    Right,
}

/// Furthest-reaching x per diagonal after round `d`.
///
/// Covers diagonals `-(d+1)..=d+1`; anything outside is unreached.
struct Frontier {
    d: isize,
    xs: Vec<isize>,
}

impl Frontier {
    fn get(&self, k: isize) -> isize {
        if k.abs() > self.d + 1 {
            return UNREACHED;
        }
        self.xs[(k + self.d + 1) as usize]
    }
}

/// Pick the predecessor for diagonal `k` in round `prev.d + 1`.
///
/// Only moves that stay inside the `n × m` edit grid are considered.
fn choose(prev: &Frontier, k: isize, n: isize, m: isize) -> Option<(Step, isize)> {
    let stay = prev.get(k);
    let below = prev.get(k + 1);
    let left = prev.get(k - 1);

    let candidates = [
        (Step::Stay, (stay != UNREACHED).then_some(stay)),
        (Step::Down, (below != UNREACHED && below - k <= m).then_some(below)),
        (Step::Right, (left != UNREACHED && left + 1 <= n).then_some(left + 1)),
    ];

    let mut best: Option<(Step, isize)> = None;
    for (step, x) in candidates {
        if let Some(x) = x {
            if best.map_or(true, |(_, bx)| x > bx) {
                best = Some((step, x));
            }
        }
    }
    best
}

fn snake(a: &[char], b: &[char], mut x: isize, k: isize) -> isize {
    let mut y = x - k;
    while (x as usize) < a.len() && (y as usize) < b.len() && a[x as usize] == b[y as usize] {
        x += 1;
        y += 1;
    }
    x
}

/// Shortest edit script from `a` to `b`, or `None` if it needs more than
/// `budget` edits.
fn myers(a: &[char], b: &[char], budget: usize) -> Option<Vec<Op>> {
    let n = a.len() as isize;
    let m = b.len() as isize;

    if n == 0 {
        return Some((0..b.len()).map(Op::Insert).collect());
    }
    if m == 0 {
        return Some((0..a.len()).map(Op::Delete).collect());
    }

    let limit = budget.min(a.len() + b.len()) as isize;
    let goal = n - m;

    let mut origin = Frontier {
        d: 0,
        xs: vec![UNREACHED; 3],
    };
    origin.xs[1] = snake(a, b, 0, 0);
    if goal == 0 && origin.xs[1] == n {
        return Some(vec![Op::Equal(a.len())]);
    }
    let mut trace = vec![origin];

    for d in 1..=limit {
        let prev = &trace[(d - 1) as usize];
        let mut xs = vec![UNREACHED; (2 * d + 3) as usize];
        for k in -(d + 1)..=(d + 1) {
            xs[(k + d + 1) as usize] = prev.get(k);
        }

        let mut found = false;
        let mut k = -d;
        while k <= d {
            if let Some((_, start)) = choose(prev, k, n, m) {
                let x = snake(a, b, start, k);
                xs[(k + d + 1) as usize] = x;
                if k == goal && x == n {
                    found = true;
                }
            }
            k += 2;
        }

        trace.push(Frontier { d, xs });
        if found {
            return Some(backtrack(&trace, a.len(), goal));
        }
    }

    None
}

/// Walk the recorded frontiers from `(n, m)` back to the origin.
fn backtrack(trace: &[Frontier], n: usize, goal: isize) -> Vec<Op> {
    let mut ops = Vec::new();
    let mut d = (trace.len() - 1) as isize;
    let mut k = goal;
    let mut x = n as isize;

    while d > 0 {
        let prev = &trace[(d - 1) as usize];
        let (step, start) = match choose(prev, k, n as isize, (n as isize) - goal) {
            Some(choice) => choice,
            None => break,
        };

        if x > start {
            ops.push(Op::Equal((x - start) as usize));
        }

        match step {
            Step::Stay => {
                d -= 2;
                x = start;
                continue;
            }
            Step::Down => {
                // Insert b[y - 1] where y = start - k
                ops.push(Op::Insert((start - k - 1) as usize));
                k += 1;
                x = start;
            }
            Step::Right => {
                ops.push(Op::Delete((start - 1) as usize));
                k -= 1;
                x = start - 1;
            }
        }
        d -= 1;
    }

    if x > 0 {
        ops.push(Op::Equal(x as usize));
    }

    ops.reverse();
    ops
}

/// Accumulates single-character steps into merged spans.
#[derive(Default)]
struct DeltaBuilder {
    edits: Vec<Edit>,
}

impl DeltaBuilder {
    fn retain(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        match self.edits.last_mut() {
            Some(Edit::Retain(r)) => *r += n,
            _ => self.edits.push(Edit::Retain(n)),
        }
    }

    fn insert(&mut self, c: char) {
        match self.edits.last_mut() {
            Some(Edit::Insert(s)) => s.push(c),
            _ => self.edits.push(Edit::Insert(c.to_string())),
        }
    }

    fn delete(&mut self, c: char) {
        match self.edits.last_mut() {
            Some(Edit::Delete(s)) => s.push(c),
            _ => self.edits.push(Edit::Delete(c.to_string())),
        }
    }

    fn finish(self) -> Vec<Edit> {
        self.edits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(a: &str, b: &str) {
        let delta = diff(a, b);
        assert_eq!(delta.apply(a).unwrap(), b, "forward {a:?} -> {b:?}");
        assert_eq!(delta.reverse().apply(b).unwrap(), a, "reverse {b:?} -> {a:?}");
    }

    #[test]
    fn test_diff_identical_is_noop() {
        let delta = diff("same text", "same text");
        assert!(delta.is_noop());
        assert_eq!(delta.edits(), &[Edit::Retain(9)]);

        let empty = diff("", "");
        assert!(empty.is_noop());
        assert!(empty.edits().is_empty());
    }

    #[test]
    fn test_diff_append() {
        let delta = diff("Hello", "Hello world");
        assert_eq!(
            delta.edits(),
            &[Edit::Retain(5), Edit::Insert(" world".into())]
        );
        assert!(!delta.is_noop());
        assert_eq!(delta.inserted_chars(), 6);
        assert_eq!(delta.deleted_chars(), 0);
    }

    #[test]
    fn test_diff_is_minimal_for_single_substitution() {
        let delta = diff("kitten", "sitten");
        assert_eq!(delta.inserted_chars(), 1);
        assert_eq!(delta.deleted_chars(), 1);
    }

    #[test]
    fn test_diff_minimal_edit_count() {
        // Classic Myers example: D = 5
        let delta = diff("ABCABBA", "CBABAC");
        assert_eq!(delta.inserted_chars() + delta.deleted_chars(), 5);
        roundtrip("ABCABBA", "CBABAC");
    }

    #[test]
    fn test_roundtrip_cases() {
        let cases = [
            ("", "fresh document"),
            ("to be removed", ""),
            ("Hello", "Hello world"),
            ("Hello world", "Hello"),
            ("abc", "xyz"),
            ("the quick brown fox", "the quack brown box jumps"),
            ("line one\nline two\nline three\n", "line one\nline 2\nline three\nline four\n"),
            ("aaaaaaaaaa", "aaaaabaaaaa"),
            ("mixed ünïcödé ✓ text", "mixed unicode ✓✓ text"),
            ("日本語のテキスト", "日本語の新しいテキスト"),
        ];
        for (a, b) in cases {
            roundtrip(a, b);
        }
    }

    #[test]
    fn test_diff_is_deterministic() {
        let a = "The meeting is on Monday at noon in room 4.";
        let b = "The meeting moved to Tuesday at 1pm in room 7.";
        assert_eq!(diff(a, b), diff(a, b));
        assert_eq!(to_patch(&diff(a, b)).unwrap(), to_patch(&diff(a, b)).unwrap());
    }

    #[test]
    fn test_budget_fallback_still_exact() {
        let a = "abcdefghijklmnopqrstuvwxyz";
        let b = "zyxwvutsrqponmlkjihgfedcba";
        let delta = diff_with_budget(a, b, 2);
        assert_eq!(delta.apply(a).unwrap(), b);
        assert_eq!(delta.reverse().apply(b).unwrap(), a);
        // Fallback replaces the whole middle
        assert_eq!(delta.deleted_chars(), 26);
        assert_eq!(delta.inserted_chars(), 26);
    }

    #[test]
    fn test_reverse_swaps_spans() {
        let delta = diff("abc", "abXc");
        let reversed = delta.reverse();
        assert_eq!(
            reversed.edits(),
            &[Edit::Retain(2), Edit::Delete("X".into()), Edit::Retain(1)]
        );
        assert_eq!(reversed.source(), delta.target());
        assert_eq!(reversed.target(), delta.source());
        assert_eq!(reversed.reverse(), delta);
    }

    #[test]
    fn test_apply_rejects_wrong_source() {
        let delta = diff("Hello", "Hello world");
        let err = delta.apply("Jello").unwrap_err();
        assert!(matches!(err, PatchError::SourceMismatch { .. }));
    }

    #[test]
    fn test_apply_rejects_context_mismatch() {
        // Same fingerprint as the source is impossible to fake cheaply, so
        // build a delta whose delete span disagrees with its own source.
        let delta = Delta {
            edits: vec![Edit::Delete("x".into())],
            source: TextFingerprint::of("y"),
            target: TextFingerprint::of(""),
        };
        assert_eq!(
            delta.apply("y").unwrap_err(),
            PatchError::ContextMismatch { offset: 0 }
        );
    }

    #[test]
    fn test_apply_rejects_short_script() {
        let delta = Delta {
            edits: vec![Edit::Retain(2)],
            source: TextFingerprint::of("abc"),
            target: TextFingerprint::of("ab"),
        };
        assert!(matches!(
            delta.apply("abc").unwrap_err(),
            PatchError::LengthMismatch { .. }
        ));
    }

    #[test]
    fn test_apply_rejects_overflowing_retain() {
        let delta = Delta {
            edits: vec![Edit::Retain(2), Edit::Retain(usize::MAX)],
            source: TextFingerprint::of("abc"),
            target: TextFingerprint::of("abc"),
        };
        assert!(matches!(
            delta.apply("abc").unwrap_err(),
            PatchError::LengthMismatch { expected: usize::MAX, actual: 3 }
        ));

        // Same script after a trip through storage
        let stored = from_patch(&to_patch(&delta).unwrap()).unwrap();
        assert!(matches!(
            stored.apply("abc").unwrap_err(),
            PatchError::LengthMismatch { .. }
        ));
        assert!(stored.reverse().apply("abc").is_err());
    }

    #[test]
    fn test_patch_blob_roundtrip() {
        let delta = diff("first draft of the note", "second draft of the note, revised");
        let blob = to_patch(&delta).unwrap();
        assert!(!blob.is_empty());
        assert_eq!(from_patch(&blob).unwrap(), delta);
    }

    #[test]
    fn test_patch_blob_stores_retains_as_counts() {
        let body = "Lorem ipsum dolor sit amet. ".repeat(400);
        let edited = format!("{body}One more sentence.");
        let blob = to_patch(&diff(&body, &edited)).unwrap();
        // Unchanged text must not be copied into the patch
        assert!(blob.len() < 128, "patch is {} bytes", blob.len());
    }

    #[test]
    fn test_from_patch_rejects_garbage() {
        // Size header of 8 followed by a truncated literal run
        let blob = PatchBlob::from_bytes(vec![8, 0, 0, 0, 0xFF, 0xFF, 0xFF]);
        assert!(from_patch(&blob).is_err());
    }

    #[test]
    fn test_fingerprint_counts_chars_not_bytes() {
        let fp = TextFingerprint::of("✓✓");
        assert_eq!(fp.chars, 2);
        assert_ne!(fp.checksum, TextFingerprint::of("✓").checksum);
    }

    #[test]
    fn test_patch_error_display() {
        let err = PatchError::ContextMismatch { offset: 17 };
        assert!(err.to_string().contains("17"));

        let err = PatchError::Decompress("bad frame".into());
        assert!(err.to_string().contains("bad frame"));
    }
}
