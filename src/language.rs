//! Static language profiles.
//!
//! Every request names a language code; the code picks the Kokoro pipeline and
//! the voice it speaks with.

use crate::error::TtsError;

/// Language used when a request omits `lang`.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Immutable description of one supported language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageProfile {
    /// Public language code accepted by the HTTP API (e.g. `"en"`).
    pub code: &'static str,
    /// Kokoro's single-letter language id (e.g. `'a'` for American English).
    pub kokoro_code: char,
    /// Voice used for this language.
    pub default_voice: &'static str,
    /// Human readable name.
    pub label: &'static str,
    /// espeak-ng language passed to the phonemizer.
    pub espeak_lang: &'static str,
}

const BUILTIN_PROFILES: &[LanguageProfile] = &[
    LanguageProfile {
        code: "en",
        kokoro_code: 'a',
        default_voice: "af_heart",
        label: "American English",
        espeak_lang: "en-us",
    },
    LanguageProfile {
        code: "gb",
        kokoro_code: 'b',
        default_voice: "bf_sunny",
        label: "British English",
        espeak_lang: "en-gb",
    },
    LanguageProfile {
        code: "es",
        kokoro_code: 'e',
        default_voice: "em_alex",
        label: "Spanish",
        espeak_lang: "es",
    },
    LanguageProfile {
        code: "ja",
        kokoro_code: 'j',
        default_voice: "jf_yama",
        label: "Japanese",
        espeak_lang: "ja",
    },
    LanguageProfile {
        code: "zh",
        kokoro_code: 'z',
        default_voice: "zf_xiaobei",
        label: "Mandarin Chinese",
        espeak_lang: "cmn",
    },
    LanguageProfile {
        code: "fr",
        kokoro_code: 'f',
        default_voice: "ff_siwis",
        label: "French",
        espeak_lang: "fr",
    },
    LanguageProfile {
        code: "hi",
        kokoro_code: 'h',
        default_voice: "hf_alpha",
        label: "Hindi",
        espeak_lang: "hi",
    },
    LanguageProfile {
        code: "it",
        kokoro_code: 'i',
        default_voice: "if_sara",
        label: "Italian",
        espeak_lang: "it",
    },
    LanguageProfile {
        code: "pt",
        kokoro_code: 'p',
        default_voice: "pf_dora",
        label: "Brazilian Portuguese",
        espeak_lang: "pt-br",
    },
];

/// Lookup table from language code to [`LanguageProfile`].
///
/// Built once at startup and never mutated.
#[derive(Debug, Clone, Copy)]
pub struct LanguageTable {
    profiles: &'static [LanguageProfile],
}

impl LanguageTable {
    /// The languages supported by the bundled Kokoro voices.
    pub const fn builtin() -> Self {
        Self {
            profiles: BUILTIN_PROFILES,
        }
    }

    /// Resolve a language code. Matching ignores case and surrounding whitespace.
    pub fn resolve(&self, code: &str) -> Result<&'static LanguageProfile, TtsError> {
        let code = code.trim();
        self.profiles
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code))
            .ok_or_else(|| TtsError::UnsupportedLanguage(code.to_string()))
    }

    pub fn profiles(&self) -> &'static [LanguageProfile] {
        self.profiles
    }

    pub fn codes(&self) -> impl Iterator<Item = &'static str> {
        self.profiles.iter().map(|p| p.code)
    }
}

impl Default for LanguageTable {
    fn default() -> Self {
        Self::builtin()
    }
}
