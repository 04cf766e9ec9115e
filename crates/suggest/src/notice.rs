//! User-facing notifications, in Hebrew.

use milim_core::{ProviderError, VoiceError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    MissingCredential,
    AuthenticationFailed,
    RateLimited,
    Transport,
    AudioBusy,
    Audio,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_provider_error(err: &ProviderError) -> Self {
        match err {
            ProviderError::MissingCredential => Self::new(
                NoticeKind::MissingCredential,
                "לא הוגדר מפתח API. יש להזין מפתח בהגדרות ולנסות שוב.",
            ),
            ProviderError::AuthenticationFailed(_) => Self::new(
                NoticeKind::AuthenticationFailed,
                "מפתח ה-API נדחה. בדקו את המפתח בהגדרות.",
            ),
            ProviderError::RateLimited { retry_after_secs } => Self::new(
                NoticeKind::RateLimited,
                format!("יותר מדי בקשות. נסו שוב בעוד {retry_after_secs} שניות."),
            ),
            _ => Self::new(
                NoticeKind::Transport,
                "אירעה שגיאה בתקשורת עם השרת. נסו שוב.",
            ),
        }
    }

    pub fn from_voice_error(err: &VoiceError) -> Self {
        match err {
            VoiceError::Busy => Self::new(
                NoticeKind::AudioBusy,
                "השמעה או הקלטה כבר פעילה. המתינו לסיומה.",
            ),
            VoiceError::Provider(inner) => Self::from_provider_error(inner),
            VoiceError::Playback(_) => Self::new(NoticeKind::Audio, "לא ניתן היה להשמיע את הקול."),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
