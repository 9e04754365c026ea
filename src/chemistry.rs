// ==============================================================================
// chemistry.rs - Instrument Chemistry Table
// ==============================================================================
// Description: Read-only lookup of instrument -> SBS chemistry, dye channel
//              model and i5 read orientation
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Channel models (two-color SBS):
//   XLEAP (Blue+Green)  - NovaSeq X, MiSeq i100, NextSeq 1000/2000
//     Channel 1 (Blue):  A + C
//     Channel 2 (Green): C + T
//     Dark: G
//   Red+Green           - NovaSeq 6000, NextSeq 500/550, MiniSeq
//     Channel 1 (Red):   A + C
//     Channel 2 (Green): A + T
//     Dark: G
//   Four-color instruments have no channel model.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;

/// A fluorescence channel of a two-color instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    Channel1,
    Channel2,
}

/// Subset of {Channel1, Channel2} lit by a base. The empty set is dark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ChannelSet {
    pub channel1: bool,
    pub channel2: bool,
}

impl ChannelSet {
    pub const DARK: ChannelSet = ChannelSet { channel1: false, channel2: false };

    const fn of(channel1: bool, channel2: bool) -> Self {
        ChannelSet { channel1, channel2 }
    }

    pub fn contains(&self, channel: Channel) -> bool {
        match channel {
            Channel::Channel1 => self.channel1,
            Channel::Channel2 => self.channel2,
        }
    }

    pub fn is_dark(&self) -> bool {
        !self.channel1 && !self.channel2
    }
}

/// SBS chemistry of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Chemistry {
    /// Two-color XLEAP-SBS (blue + green)
    TwoColorXleap,
    /// Two-color SBS (red + green)
    TwoColorRedGreen,
    /// Four-color SBS, every base has its own dye
    FourColor,
}

impl Chemistry {
    pub fn is_two_color(&self) -> bool {
        !matches!(self, Chemistry::FourColor)
    }

    /// Channels lit by `base`.
    ///
    /// Returns `None` for four-color chemistry (no channel model) and for
    /// bases outside A/C/G/T such as `N`.
    pub fn channels(&self, base: u8) -> Option<ChannelSet> {
        let set = match (self, base.to_ascii_uppercase()) {
            (Chemistry::FourColor, _) => return None,
            (Chemistry::TwoColorXleap, b'A') => ChannelSet::of(true, false),
            (Chemistry::TwoColorXleap, b'C') => ChannelSet::of(true, true),
            (Chemistry::TwoColorXleap, b'T') => ChannelSet::of(false, true),
            (Chemistry::TwoColorRedGreen, b'A') => ChannelSet::of(true, true),
            (Chemistry::TwoColorRedGreen, b'C') => ChannelSet::of(true, false),
            (Chemistry::TwoColorRedGreen, b'T') => ChannelSet::of(false, true),
            (_, b'G') => ChannelSet::DARK,
            _ => return None,
        };
        Some(set)
    }

    /// True when `base` produces no signal in either channel
    pub fn is_dark(&self, base: u8) -> bool {
        self.channels(base).map(|set| set.is_dark()).unwrap_or(false)
    }

    /// Display names of (Channel1, Channel2)
    pub fn channel_names(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Chemistry::TwoColorXleap => Some(("Blue", "Green")),
            Chemistry::TwoColorRedGreen => Some(("Red", "Green")),
            Chemistry::FourColor => None,
        }
    }
}

/// Orientation in which the instrument reads the i5 (Index 2) read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum I5Orientation {
    Forward,
    ReverseComplement,
}

impl fmt::Display for I5Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            I5Orientation::Forward => f.write_str("forward"),
            I5Orientation::ReverseComplement => f.write_str("reverse-complement"),
        }
    }
}

/// Static description of a sequencing instrument
#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct Instrument {
    /// Display name, also the lookup key (e.g. "NovaSeq X Series")
    pub name: &'static str,
    /// Name written to `InstrumentPlatform` in the sample sheet
    pub platform_name: &'static str,
    pub chemistry: Chemistry,
    pub i5_orientation: I5Orientation,
    /// Onboard BCL Convert version, when known
    pub bclconvert_version: Option<&'static str>,
    /// Also accepts a v1 (IEM) sample sheet
    pub samplesheet_v1: bool,
}

static INSTRUMENTS: &[Instrument] = &[
    Instrument {
        name: "NovaSeq X Series",
        platform_name: "NovaSeqXSeries",
        chemistry: Chemistry::TwoColorXleap,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: Some("4.3.6"),
        samplesheet_v1: false,
    },
    Instrument {
        name: "MiSeq i100 Series",
        platform_name: "MiSeqi100Series",
        chemistry: Chemistry::TwoColorXleap,
        i5_orientation: I5Orientation::Forward,
        bclconvert_version: Some("4.3.13"),
        samplesheet_v1: false,
    },
    Instrument {
        name: "NextSeq 1000/2000",
        platform_name: "NextSeq1k2k",
        chemistry: Chemistry::TwoColorXleap,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: Some("4.2.7"),
        samplesheet_v1: false,
    },
    Instrument {
        name: "NovaSeq 6000",
        platform_name: "NovaSeq6000",
        chemistry: Chemistry::TwoColorRedGreen,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: None,
        samplesheet_v1: true,
    },
    Instrument {
        name: "NextSeq 500/550",
        platform_name: "NextSeq500_550",
        chemistry: Chemistry::TwoColorRedGreen,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: None,
        samplesheet_v1: false,
    },
    Instrument {
        name: "MiniSeq",
        platform_name: "MiniSeq",
        chemistry: Chemistry::TwoColorRedGreen,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: None,
        samplesheet_v1: false,
    },
    Instrument {
        name: "MiSeq",
        platform_name: "MiSeq",
        chemistry: Chemistry::FourColor,
        i5_orientation: I5Orientation::Forward,
        bclconvert_version: None,
        samplesheet_v1: true,
    },
    Instrument {
        name: "HiSeq 4000",
        platform_name: "HiSeq4000",
        chemistry: Chemistry::FourColor,
        i5_orientation: I5Orientation::ReverseComplement,
        bclconvert_version: None,
        samplesheet_v1: false,
    },
];

/// All known instruments, in display order
pub fn instruments() -> &'static [Instrument] {
    INSTRUMENTS
}

/// Look up an instrument by display name (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static Instrument> {
    INSTRUMENTS
        .iter()
        .find(|instrument| instrument.name.eq_ignore_ascii_case(name.trim()))
}

/// Serde adapter storing an instrument reference as its display name
pub mod by_name {
    use super::{lookup, Instrument};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(instrument: &&'static Instrument, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(instrument.name)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<&'static Instrument, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        lookup(&name).ok_or_else(|| D::Error::custom(format!("unknown instrument '{}'", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xleap_channel_model() {
        let chem = Chemistry::TwoColorXleap;
        assert_eq!(chem.channels(b'A'), Some(ChannelSet { channel1: true, channel2: false }));
        assert_eq!(chem.channels(b'C'), Some(ChannelSet { channel1: true, channel2: true }));
        assert_eq!(chem.channels(b'T'), Some(ChannelSet { channel1: false, channel2: true }));
        assert_eq!(chem.channels(b'G'), Some(ChannelSet::DARK));
        assert_eq!(chem.channels(b'N'), None);
        assert!(chem.is_dark(b'g'));
        assert!(!chem.is_dark(b'N'));
    }

    #[test]
    fn test_red_green_channel_model() {
        let chem = Chemistry::TwoColorRedGreen;
        assert!(chem.channels(b'A').unwrap().contains(Channel::Channel1));
        assert!(chem.channels(b'A').unwrap().contains(Channel::Channel2));
        assert!(!chem.channels(b'C').unwrap().contains(Channel::Channel2));
        assert!(chem.is_dark(b'G'));
    }

    #[test]
    fn test_four_color_has_no_channel_model() {
        let chem = Chemistry::FourColor;
        assert!(!chem.is_two_color());
        assert_eq!(chem.channels(b'G'), None);
        assert!(!chem.is_dark(b'G'));
        assert_eq!(chem.channel_names(), None);
    }

    #[test]
    fn test_lookup() {
        let novaseq_x = lookup("NovaSeq X Series").unwrap();
        assert_eq!(novaseq_x.platform_name, "NovaSeqXSeries");
        assert_eq!(novaseq_x.i5_orientation, I5Orientation::ReverseComplement);

        let miseq = lookup("miseq").unwrap();
        assert_eq!(miseq.chemistry, Chemistry::FourColor);
        assert_eq!(miseq.i5_orientation, I5Orientation::Forward);

        assert!(miseq.samplesheet_v1);
        assert!(lookup("NovaSeq 6000").unwrap().samplesheet_v1);
        assert!(!novaseq_x.samplesheet_v1);

        assert!(lookup("NonExistent Instrument").is_none());
        assert!(instruments().len() >= 8);
    }

    #[test]
    fn test_orientation_serde() {
        let json = serde_json::to_string(&I5Orientation::ReverseComplement).unwrap();
        assert_eq!(json, "\"reverse-complement\"");
        assert_eq!(I5Orientation::Forward.to_string(), "forward");
    }
}
