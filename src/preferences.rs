//! Locale and theme, persisted in the durable scope and independent of the session.
//! Unknown stored values read back as the default.

use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult};
use crate::storage::{keys, SessionStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locale {
    #[default]
    En,
    Ru,
    Kz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Ru => "ru",
            Locale::Kz => "kz",
        }
    }
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Theme {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl FromStr for Locale {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "ru" => Ok(Locale::Ru),
            "kz" => Ok(Locale::Kz),
            other => Err(AppError::internal("unknown_locale".to_string(), format!("unsupported locale '{}'", other))),
        }
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(AppError::internal("unknown_theme".to_string(), format!("unsupported theme '{}'", other))),
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

pub struct Preferences<'a> {
    store: &'a SessionStore,
}

impl<'a> Preferences<'a> {
    pub fn new(store: &'a SessionStore) -> Self { Self { store } }

    pub fn locale(&self) -> Locale {
        self.store.durable().read(keys::LOCALE).and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn set_locale(&self, locale: Locale) -> AppResult<()> { self.store.durable().write(keys::LOCALE, locale.as_str()) }

    pub fn theme(&self) -> Theme {
        self.store.durable().read(keys::THEME).and_then(|v| v.parse().ok()).unwrap_or_default()
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<()> { self.store.durable().write(keys::THEME, theme.as_str()) }

    /// Flip and persist; returns the new theme.
    pub fn toggle_theme(&self) -> AppResult<Theme> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }
}
