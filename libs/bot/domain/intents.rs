//! Gateway intents

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign, Sub};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown intent '{0}'")]
pub struct UnknownIntent(pub String);

/// Bitmask of gateway event groups the bot subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Intents(u64);

impl Intents {
    pub const GUILDS: Self = Self(1 << 0);
    /// Privileged
    pub const GUILD_MEMBERS: Self = Self(1 << 1);
    pub const GUILD_MODERATION: Self = Self(1 << 2);
    pub const GUILD_EXPRESSIONS: Self = Self(1 << 3);
    pub const GUILD_INTEGRATIONS: Self = Self(1 << 4);
    pub const GUILD_WEBHOOKS: Self = Self(1 << 5);
    pub const GUILD_INVITES: Self = Self(1 << 6);
    pub const GUILD_VOICE_STATES: Self = Self(1 << 7);
    /// Privileged
    pub const GUILD_PRESENCES: Self = Self(1 << 8);
    pub const GUILD_MESSAGES: Self = Self(1 << 9);
    pub const GUILD_MESSAGE_REACTIONS: Self = Self(1 << 10);
    pub const GUILD_MESSAGE_TYPING: Self = Self(1 << 11);
    pub const DIRECT_MESSAGES: Self = Self(1 << 12);
    pub const DIRECT_MESSAGE_REACTIONS: Self = Self(1 << 13);
    pub const DIRECT_MESSAGE_TYPING: Self = Self(1 << 14);
    /// Privileged
    pub const MESSAGE_CONTENT: Self = Self(1 << 15);
    pub const GUILD_SCHEDULED_EVENTS: Self = Self(1 << 16);
    pub const AUTO_MODERATION_CONFIGURATION: Self = Self(1 << 20);
    pub const AUTO_MODERATION_EXECUTION: Self = Self(1 << 21);
    pub const GUILD_MESSAGE_POLLS: Self = Self(1 << 24);
    pub const DIRECT_MESSAGE_POLLS: Self = Self(1 << 25);

    const NAMED: [(&'static str, Intents); 21] = [
        ("GUILDS", Self::GUILDS),
        ("GUILD_MEMBERS", Self::GUILD_MEMBERS),
        ("GUILD_MODERATION", Self::GUILD_MODERATION),
        ("GUILD_EXPRESSIONS", Self::GUILD_EXPRESSIONS),
        ("GUILD_INTEGRATIONS", Self::GUILD_INTEGRATIONS),
        ("GUILD_WEBHOOKS", Self::GUILD_WEBHOOKS),
        ("GUILD_INVITES", Self::GUILD_INVITES),
        ("GUILD_VOICE_STATES", Self::GUILD_VOICE_STATES),
        ("GUILD_PRESENCES", Self::GUILD_PRESENCES),
        ("GUILD_MESSAGES", Self::GUILD_MESSAGES),
        ("GUILD_MESSAGE_REACTIONS", Self::GUILD_MESSAGE_REACTIONS),
        ("GUILD_MESSAGE_TYPING", Self::GUILD_MESSAGE_TYPING),
        ("DIRECT_MESSAGES", Self::DIRECT_MESSAGES),
        ("DIRECT_MESSAGE_REACTIONS", Self::DIRECT_MESSAGE_REACTIONS),
        ("DIRECT_MESSAGE_TYPING", Self::DIRECT_MESSAGE_TYPING),
        ("MESSAGE_CONTENT", Self::MESSAGE_CONTENT),
        ("GUILD_SCHEDULED_EVENTS", Self::GUILD_SCHEDULED_EVENTS),
        ("AUTO_MODERATION_CONFIGURATION", Self::AUTO_MODERATION_CONFIGURATION),
        ("AUTO_MODERATION_EXECUTION", Self::AUTO_MODERATION_EXECUTION),
        ("GUILD_MESSAGE_POLLS", Self::GUILD_MESSAGE_POLLS),
        ("DIRECT_MESSAGE_POLLS", Self::DIRECT_MESSAGE_POLLS),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Keep only the bits that name a known intent
    pub fn from_bits_truncate(bits: u64) -> Self {
        Self(bits & Self::all().0)
    }

    /// Every known intent
    pub fn all() -> Self {
        Self::NAMED
            .iter()
            .fold(Self::empty(), |acc, (_, intent)| acc | *intent)
    }

    /// The intents that must be enabled in the developer portal
    pub const fn privileged() -> Self {
        Self(Self::GUILD_MEMBERS.0 | Self::GUILD_PRESENCES.0 | Self::MESSAGE_CONTENT.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Look up one intent by name, case-insensitively
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::NAMED
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(name))
            .map(|(_, intent)| *intent)
    }

    /// Combine intents named in config
    pub fn from_names<I, S>(names: I) -> Result<Self, UnknownIntent>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().try_fold(Self::empty(), |acc, name| {
            let name = name.as_ref();
            Self::from_name(name)
                .map(|intent| acc | intent)
                .ok_or_else(|| UnknownIntent(name.to_string()))
        })
    }

    /// Names of the intents set in this mask
    pub fn names(self) -> Vec<&'static str> {
        Self::NAMED
            .iter()
            .filter(|(_, intent)| self.contains(*intent))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for Intents {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Intents {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl Sub for Intents {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 & !rhs.0)
    }
}

impl fmt::Display for Intents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(" | "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composition() {
        let intents = Intents::GUILDS | Intents::GUILD_MESSAGES;
        assert_eq!(intents.bits(), 513);
        assert!(intents.contains(Intents::GUILDS));
        assert!(!intents.contains(Intents::MESSAGE_CONTENT));
        assert_eq!((intents - Intents::GUILDS).bits(), 512);
    }

    #[test]
    fn test_privileged_set() {
        let privileged = Intents::privileged();
        assert_eq!(privileged.bits(), (1 << 1) | (1 << 8) | (1 << 15));
        assert!(Intents::all().contains(privileged));
    }

    #[test]
    fn test_all_has_no_gaps_filled() {
        let all = Intents::all();
        assert!(!all.contains(Intents(1 << 17)));
        assert_eq!(all.names().len(), 21);
        assert_eq!(Intents::from_bits_truncate(u64::MAX), all);
    }

    #[test]
    fn test_from_names() {
        let intents = Intents::from_names(["guilds", "GUILD_MESSAGES"]).unwrap();
        assert_eq!(intents.bits(), 513);
        assert_eq!(
            Intents::from_names(["GUILDS", "VOICE"]),
            Err(UnknownIntent("VOICE".to_string()))
        );
        assert_eq!(intents.to_string(), "GUILDS | GUILD_MESSAGES");
    }
}
