// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wearable data providers.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of supported wearable providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Whoop,
    Oura,
}

impl Provider {
    pub const ALL: [Provider; 2] = [Provider::Whoop, Provider::Oura];

    /// Lowercase identifier used in URLs and document keys.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Whoop => "whoop",
            Provider::Oura => "oura",
        }
    }

    /// Human-readable name for messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Whoop => "Whoop",
            Provider::Oura => "Oura",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "whoop" => Ok(Provider::Whoop),
            "oura" => Ok(Provider::Oura),
            _ => Err(AppError::UnsupportedProvider(s.to_string())),
        }
    }
}
