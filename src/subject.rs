//! What a forecast is generated for: signs, profile, ISO week, language.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZodiacSign {
    Aries,
    Taurus,
    Gemini,
    Cancer,
    Leo,
    Virgo,
    Libra,
    Scorpio,
    Sagittarius,
    Capricorn,
    Aquarius,
    Pisces,
}

impl ZodiacSign {
    pub const ALL: [ZodiacSign; 12] = [
        ZodiacSign::Aries,
        ZodiacSign::Taurus,
        ZodiacSign::Gemini,
        ZodiacSign::Cancer,
        ZodiacSign::Leo,
        ZodiacSign::Virgo,
        ZodiacSign::Libra,
        ZodiacSign::Scorpio,
        ZodiacSign::Sagittarius,
        ZodiacSign::Capricorn,
        ZodiacSign::Aquarius,
        ZodiacSign::Pisces,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "aries",
            ZodiacSign::Taurus => "taurus",
            ZodiacSign::Gemini => "gemini",
            ZodiacSign::Cancer => "cancer",
            ZodiacSign::Leo => "leo",
            ZodiacSign::Virgo => "virgo",
            ZodiacSign::Libra => "libra",
            ZodiacSign::Scorpio => "scorpio",
            ZodiacSign::Sagittarius => "sagittarius",
            ZodiacSign::Capricorn => "capricorn",
            ZodiacSign::Aquarius => "aquarius",
            ZodiacSign::Pisces => "pisces",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            ZodiacSign::Aries => "♈\u{fe0e}",
            ZodiacSign::Taurus => "♉\u{fe0e}",
            ZodiacSign::Gemini => "♊\u{fe0e}",
            ZodiacSign::Cancer => "♋\u{fe0e}",
            ZodiacSign::Leo => "♌\u{fe0e}",
            ZodiacSign::Virgo => "♍\u{fe0e}",
            ZodiacSign::Libra => "♎\u{fe0e}",
            ZodiacSign::Scorpio => "♏\u{fe0e}",
            ZodiacSign::Sagittarius => "♐\u{fe0e}",
            ZodiacSign::Capricorn => "♑\u{fe0e}",
            ZodiacSign::Aquarius => "♒\u{fe0e}",
            ZodiacSign::Pisces => "♓\u{fe0e}",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for ZodiacSign {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reduce a language identifier (`pt_BR`, `es-ES`, `zh-Hans`) to its
/// lowercase primary subtag. Empty input yields `en`.
pub fn normalize_language_code(identifier: &str) -> String {
    let code: String = identifier
        .split(|c| c == '-' || c == '_')
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if code.is_empty() {
        "en".to_string()
    } else {
        code
    }
}

/// The profile fields the pipeline consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastProfile {
    pub id: Uuid,
    pub sun_sign: ZodiacSign,
    pub rising_sign: ZodiacSign,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ForecastSubject {
    profile_id: Uuid,
    sun_sign: ZodiacSign,
    rising_sign: ZodiacSign,
    iso_week: u32,
    iso_year: i32,
    language: String,
}

impl ForecastSubject {
    pub fn new(
        profile_id: Uuid,
        sun_sign: ZodiacSign,
        rising_sign: ZodiacSign,
        iso_week: u32,
        iso_year: i32,
        language_identifier: &str,
    ) -> Self {
        Self {
            profile_id,
            sun_sign,
            rising_sign,
            iso_week,
            iso_year,
            language: normalize_language_code(language_identifier),
        }
    }

    /// Subject for the ISO week containing `date`.
    pub fn for_date(profile: &ForecastProfile, date: NaiveDate, language_identifier: &str) -> Self {
        let week = date.iso_week();
        Self::new(
            profile.id,
            profile.sun_sign,
            profile.rising_sign,
            week.week(),
            week.year(),
            language_identifier,
        )
    }

    pub fn with_language(&self, language_identifier: &str) -> Self {
        Self {
            language: normalize_language_code(language_identifier),
            ..self.clone()
        }
    }

    pub fn profile_id(&self) -> Uuid {
        self.profile_id
    }

    pub fn sun_sign(&self) -> ZodiacSign {
        self.sun_sign
    }

    pub fn rising_sign(&self) -> ZodiacSign {
        self.rising_sign
    }

    pub fn iso_week(&self) -> u32 {
        self.iso_week
    }

    pub fn iso_year(&self) -> i32 {
        self.iso_year
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// No field can contain `|`: UUID text, sign names, integers and an
    /// alphanumeric language code.
    pub fn cache_key(&self) -> String {
        format!(
            "{}|{}|{}|{}-W{}|{}",
            self.profile_id, self.sun_sign, self.rising_sign, self.iso_year, self.iso_week, self.language
        )
    }
}

/// Display model handed to the UI layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Horoscope {
    pub sign: ZodiacSign,
    pub week_of_year: u32,
    pub paragraphs: Vec<String>,
}

impl Horoscope {
    pub fn text(&self) -> &str {
        self.paragraphs.first().map(String::as_str).unwrap_or("")
    }
}
