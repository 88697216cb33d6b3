//! Text to Kokoro token ids through espeak-ng.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use super::model::KokoroError;
use super::vocab::Vocab;

/// Where to find espeak-ng. Both paths fall back to the system install.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    pub bin_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self, lang: &str) -> Command {
        let bin = self
            .bin_path
            .as_deref()
            .unwrap_or_else(|| Path::new("espeak-ng"));
        let mut command = Command::new(bin);
        if let Some(data) = &self.data_path {
            let mut arg = OsString::from("--path=");
            arg.push(data);
            command.arg(arg);
        }
        command.args(["--ipa", "--stdin", "-q", "-v", lang]);
        command
    }
}

/// Piece of input text: a run of words, or a punctuation mark that is fed to
/// the model directly instead of through espeak-ng.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Words(String),
    Mark(char),
}

/// Convert `text` to token ids in espeak-ng language `lang`.
///
/// IPA characters missing from `vocab` are dropped.
pub fn phonemize(
    text: &str,
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<i64>, KokoroError> {
    let segments = segment(text);
    let phrases: Vec<&str> = segments
        .iter()
        .filter_map(|s| match s {
            Segment::Words(words) => Some(words.as_str()),
            Segment::Mark(_) => None,
        })
        .collect();

    let mut phrase_ids = if phrases.is_empty() {
        Vec::new()
    } else {
        phonemize_phrases(&phrases, lang, vocab, espeak)?
    }
    .into_iter();

    let mut ids = Vec::new();
    for segment in &segments {
        match segment {
            Segment::Words(_) => ids.extend(phrase_ids.next().unwrap_or_default()),
            Segment::Mark(mark) => ids.extend(vocab.get(mark).copied()),
        }
    }
    Ok(ids)
}

/// Split text into word runs and boundary punctuation, collapsing whitespace.
/// Line breaks act as full stops; `.` and `,` between digits stay in the words.
fn segment(text: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut words = String::new();
    let mut prev: Option<char> = None;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        let next = chars.peek().copied();
        let in_number = matches!(ch, '.' | ',')
            && prev.is_some_and(|c| c.is_ascii_digit())
            && next.is_some_and(|c| c.is_ascii_digit());
        prev = Some(ch);

        if let Some(mark) = boundary_mark(ch).filter(|_| !in_number) {
            flush_words(&mut segments, &mut words);
            segments.push(Segment::Mark(mark));
        } else if ch.is_whitespace() {
            if !words.is_empty() && !words.ends_with(' ') {
                words.push(' ');
            }
        } else {
            words.push(ch);
        }
    }

    flush_words(&mut segments, &mut words);
    segments
}

fn flush_words(segments: &mut Vec<Segment>, words: &mut String) {
    let trimmed = words.trim();
    if !trimmed.is_empty() {
        segments.push(Segment::Words(trimmed.to_string()));
    }
    words.clear();
}

fn boundary_mark(ch: char) -> Option<char> {
    match ch {
        '.' | '!' | '?' | ',' | ';' | ':' | '—' | '…' | '"' | '(' | ')' | '\u{201c}'
        | '\u{201d}' => Some(ch),
        '\n' | '\r' => Some('.'),
        _ => None,
    }
}

/// Phonemize all phrases with one espeak-ng run, one line per phrase. Falls
/// back to a run per phrase if espeak-ng does not answer line for line.
fn phonemize_phrases(
    phrases: &[&str],
    lang: &str,
    vocab: &Vocab,
    espeak: &EspeakConfig,
) -> Result<Vec<Vec<i64>>, KokoroError> {
    let output = run_espeak(&phrases.join("\n"), lang, espeak)?;
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() == phrases.len() {
        return Ok(lines.iter().map(|line| ipa_to_ids(line, vocab)).collect());
    }

    log::debug!(
        "espeak-ng returned {} lines for {} phrases, phonemizing one by one",
        lines.len(),
        phrases.len()
    );
    phrases
        .iter()
        .map(|phrase| Ok(ipa_to_ids(&run_espeak(phrase, lang, espeak)?, vocab)))
        .collect()
}

fn run_espeak(input: &str, lang: &str, espeak: &EspeakConfig) -> Result<String, KokoroError> {
    let output = run_with_stdin(espeak.command(lang), &stdin_payload(input)).map_err(|e| {
        match e.kind() {
            std::io::ErrorKind::NotFound => KokoroError::EspeakNotFound,
            _ => KokoroError::Io(e),
        }
    })?;
    if !output.status.success() {
        return Err(KokoroError::PhonemizerFailed(format!(
            "espeak-ng exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Spawn `command`, feed it `payload` on stdin and collect its output.
///
/// stdin is written from a second thread while this one drains stdout and
/// stderr, so output larger than the pipe buffer cannot stall the child.
fn run_with_stdin(mut command: Command, payload: &str) -> std::io::Result<Output> {
    let mut child = command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let stdin = child.stdin.take();

    std::thread::scope(|scope| {
        let writer = scope.spawn(move || match stdin {
            // Dropping stdin at the end of the write closes the pipe.
            Some(mut stdin) => stdin.write_all(payload.as_bytes()),
            None => Ok(()),
        });
        let output = child.wait_with_output()?;
        match writer.join() {
            Ok(Ok(())) => {}
            // The child stopped reading; its exit status is reported instead.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(std::io::Error::other("espeak-ng stdin writer panicked")),
        }
        Ok(output)
    })
}

/// espeak-ng reads stdin line by line and under-processes an unterminated
/// last line, so the payload always ends with a newline.
fn stdin_payload(input: &str) -> String {
    let mut payload = input.to_string();
    if !payload.ends_with('\n') {
        payload.push('\n');
    }
    payload
}

fn ipa_to_ids(ipa: &str, vocab: &Vocab) -> Vec<i64> {
    ipa.lines()
        .map(str::trim)
        .flat_map(str::chars)
        .filter(|&ch| ch != '_')
        .filter_map(|ch| vocab.get(&ch).copied())
        .collect()
}
