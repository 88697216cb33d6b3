use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::model::{KokoroError, STYLE_DIM};

/// One row of a voice pack.
pub type StyleVector = [f32; STYLE_DIM];

const NPY_MAGIC: &[u8] = b"\x93NUMPY";

/// Voice packs loaded from a `.npz` archive.
///
/// Each voice holds one style vector per input length; row `n` is meant for
/// an utterance of `n` phoneme tokens.
pub struct VoiceStore {
    voices: HashMap<String, Vec<StyleVector>>,
}

impl VoiceStore {
    /// Load every `<voice>.npy` entry of the archive at `path`.
    pub fn load(path: &Path) -> Result<Self, KokoroError> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)
            .map_err(|e| KokoroError::VoiceParse(format!("{}: {e}", path.display())))?;

        let mut voices = HashMap::new();
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| KokoroError::VoiceParse(format!("entry {index}: {e}")))?;
            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let voice = entry_name.trim_end_matches(".npy");
            if voice.is_empty() {
                continue;
            }

            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| KokoroError::VoiceParse(format!("{entry_name}: {e}")))?;
            voices.insert(voice.to_string(), parse_npy(&data, &entry_name)?);
        }

        log::info!("Loaded {} voices from {}", voices.len(), path.display());
        Ok(Self { voices })
    }

    pub fn contains(&self, voice: &str) -> bool {
        self.voices.contains_key(voice)
    }

    /// Style vector of `voice` for an utterance of `token_count` tokens,
    /// clamped to the last row.
    pub fn style(&self, voice: &str, token_count: usize) -> Result<StyleVector, KokoroError> {
        let rows = self
            .voices
            .get(voice)
            .ok_or_else(|| KokoroError::VoiceNotFound(voice.to_string()))?;
        rows.get(token_count)
            .or_else(|| rows.last())
            .copied()
            .ok_or_else(|| KokoroError::VoiceParse(format!("voice '{voice}' has no style rows")))
    }

    /// Voice names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.voices.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Parse a little-endian float32 `.npy` array whose trailing dimension is
/// [`STYLE_DIM`]. Format versions 1.x (u16 header length) and 2.x/3.x (u32)
/// are accepted.
fn parse_npy(data: &[u8], name: &str) -> Result<Vec<StyleVector>, KokoroError> {
    let invalid = |reason: String| KokoroError::VoiceParse(format!("{name}: {reason}"));

    if data.len() < 10 || !data.starts_with(NPY_MAGIC) {
        return Err(invalid("not a .npy file".to_string()));
    }

    let (header_len, header_start) = match data[6] {
        1 => (u16::from_le_bytes([data[8], data[9]]) as usize, 10),
        2 | 3 if data.len() >= 12 => (
            u32::from_le_bytes([data[8], data[9], data[10], data[11]]) as usize,
            12,
        ),
        version => return Err(invalid(format!("unsupported .npy version {version}"))),
    };

    let payload = data
        .get(header_start + header_len..)
        .ok_or_else(|| invalid(format!("header truncated ({} bytes)", data.len())))?;

    let row_bytes = STYLE_DIM * 4;
    if payload.len() % row_bytes != 0 {
        return Err(invalid(format!(
            "{} data bytes is not a whole number of {STYLE_DIM}-float rows",
            payload.len()
        )));
    }

    Ok(payload
        .chunks_exact(row_bytes)
        .map(|row| {
            let mut style = [0f32; STYLE_DIM];
            for (value, bytes) in style.iter_mut().zip(row.chunks_exact(4)) {
                *value = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            }
            style
        })
        .collect())
}
