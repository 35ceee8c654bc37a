use anyhow::Result;

use crate::storage::Storage;

pub const MODEL_KEY: &str = "model";
pub const DEV_MODE_KEY: &str = "dev-mode";
pub const FONT_SIZE_KEY: &str = "font-size";
pub const ASR_MODEL_KEY: &str = "asr-model";

pub const MODEL_OPTIONS: &[&str] = &["gpt-4o", "gpt-4o-mini", "gpt-4"];
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub const ASR_MODEL_OPTIONS: &[&str] = &[
    "facebook/wav2vec2-base-960h",
    "openai/whisper-tiny",
    "openai/whisper-small",
    "openai/whisper-large-v3-turbo",
];
pub const DEFAULT_ASR_MODEL: &str = "openai/whisper-small";

/// Rendering density for the chat view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontSize {
    Small,
    #[default]
    Base,
    Large,
}

impl FontSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Base => "base",
            FontSize::Large => "large",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "small" => Some(FontSize::Small),
            "base" => Some(FontSize::Base),
            "large" => Some(FontSize::Large),
            _ => None,
        }
    }

    pub fn next(&self) -> Self {
        match self {
            FontSize::Small => FontSize::Base,
            FontSize::Base => FontSize::Large,
            FontSize::Large => FontSize::Small,
        }
    }

    /// Blank lines inserted between rendered messages.
    pub fn message_spacing(&self) -> u16 {
        match self {
            FontSize::Small => 0,
            FontSize::Base => 1,
            FontSize::Large => 2,
        }
    }
}

/// Flat session settings, persisted one storage key each, independently of
/// conversation content. Read once at startup; written on every change.
#[derive(Debug, Clone)]
pub struct Preferences {
    pub model: String,
    pub dev_mode: bool,
    pub font_size: FontSize,
    pub asr_model: String,
}

impl Preferences {
    pub fn load<S: Storage>(storage: &S) -> Self {
        Self {
            model: storage
                .get(MODEL_KEY)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            dev_mode: storage.get(DEV_MODE_KEY).as_deref() == Some("true"),
            font_size: storage
                .get(FONT_SIZE_KEY)
                .and_then(|s| FontSize::parse(&s))
                .unwrap_or_default(),
            asr_model: storage
                .get(ASR_MODEL_KEY)
                .unwrap_or_else(|| DEFAULT_ASR_MODEL.to_string()),
        }
    }

    pub fn set_model<S: Storage>(&mut self, storage: &mut S, model: &str) -> Result<()> {
        self.model = model.to_string();
        storage.set(MODEL_KEY, model)
    }

    pub fn cycle_model<S: Storage>(&mut self, storage: &mut S) -> Result<()> {
        let idx = MODEL_OPTIONS
            .iter()
            .position(|m| *m == self.model)
            .unwrap_or(0);
        let next = MODEL_OPTIONS[(idx + 1) % MODEL_OPTIONS.len()];
        self.set_model(storage, next)
    }

    pub fn set_dev_mode<S: Storage>(&mut self, storage: &mut S, on: bool) -> Result<()> {
        self.dev_mode = on;
        storage.set(DEV_MODE_KEY, if on { "true" } else { "false" })
    }

    pub fn set_font_size<S: Storage>(&mut self, storage: &mut S, size: FontSize) -> Result<()> {
        self.font_size = size;
        storage.set(FONT_SIZE_KEY, size.as_str())
    }

    pub fn set_asr_model<S: Storage>(&mut self, storage: &mut S, model: &str) -> Result<()> {
        self.asr_model = model.to_string();
        storage.set(ASR_MODEL_KEY, model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    #[test]
    fn defaults_when_nothing_is_stored() {
        let storage = MemoryStorage::new();
        let prefs = Preferences::load(&storage);

        assert_eq!(prefs.model, DEFAULT_MODEL);
        assert!(!prefs.dev_mode);
        assert_eq!(prefs.font_size, FontSize::Base);
        assert_eq!(prefs.asr_model, DEFAULT_ASR_MODEL);
    }

    #[test]
    fn changes_are_written_through() {
        let mut storage = MemoryStorage::new();
        let mut prefs = Preferences::load(&storage);

        prefs.set_model(&mut storage, "gpt-4").unwrap();
        prefs.set_dev_mode(&mut storage, true).unwrap();
        prefs.set_font_size(&mut storage, FontSize::Large).unwrap();

        let reloaded = Preferences::load(&storage);
        assert_eq!(reloaded.model, "gpt-4");
        assert!(reloaded.dev_mode);
        assert_eq!(reloaded.font_size, FontSize::Large);
    }

    #[test]
    fn unknown_font_size_falls_back_to_default() {
        let mut storage = MemoryStorage::new();
        storage.set(FONT_SIZE_KEY, "text-7xl").unwrap();
        assert_eq!(Preferences::load(&storage).font_size, FontSize::Base);
    }

    #[test]
    fn cycle_model_walks_the_options() {
        let mut storage = MemoryStorage::new();
        let mut prefs = Preferences::load(&storage);
        assert_eq!(prefs.model, "gpt-4o-mini");

        prefs.cycle_model(&mut storage).unwrap();
        assert_eq!(prefs.model, "gpt-4");
        prefs.cycle_model(&mut storage).unwrap();
        assert_eq!(prefs.model, "gpt-4o");
    }
}
