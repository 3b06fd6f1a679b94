use ratatui::style::Color;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Named backgrounds offered by the picker, in cycling order.
pub const PRESETS: &[(&str, Color)] = &[
    ("ocean", Color::Rgb(0x1b, 0x3a, 0x5c)),
    ("forest", Color::Rgb(0x1f, 0x3d, 0x2b)),
    ("sunset", Color::Rgb(0x5c, 0x2a, 0x1b)),
    ("paper", Color::Rgb(0xf4, 0xec, 0xd8)),
];

/// Background painted behind the app, replacing the theme background.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Wallpaper {
    #[default]
    None,
    Preset(String),
    Custom(u8, u8, u8),
}

impl Wallpaper {
    pub fn background(&self) -> Option<Color> {
        match self {
            Wallpaper::None => None,
            Wallpaper::Preset(name) => PRESETS
                .iter()
                .find(|(preset, _)| preset == name)
                .map(|(_, color)| *color),
            Wallpaper::Custom(r, g, b) => Some(Color::Rgb(*r, *g, *b)),
        }
    }

    /// Steps through none -> presets -> none. A custom colour restarts the cycle.
    pub fn cycle(&self) -> Self {
        let next = match self {
            Wallpaper::Preset(name) => PRESETS
                .iter()
                .position(|(preset, _)| preset == name)
                .map(|i| i + 1),
            _ => Some(0),
        };
        match next.and_then(|i| PRESETS.get(i)) {
            Some((name, _)) => Wallpaper::Preset(name.to_string()),
            None => Wallpaper::None,
        }
    }
}

impl fmt::Display for Wallpaper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Wallpaper::None => f.write_str("none"),
            Wallpaper::Preset(name) => f.write_str(name),
            Wallpaper::Custom(r, g, b) => write!(f, "#{r:02x}{g:02x}{b:02x}"),
        }
    }
}

impl FromStr for Wallpaper {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("none") {
            return Ok(Wallpaper::None);
        }
        if let Some(hex) = s.strip_prefix('#') {
            return parse_hex(hex).ok_or_else(|| format!("invalid colour `{s}`, expected #rrggbb"));
        }
        let name = s.to_ascii_lowercase();
        if PRESETS.iter().any(|(preset, _)| *preset == name) {
            return Ok(Wallpaper::Preset(name));
        }
        let names: Vec<&str> = PRESETS.iter().map(|(preset, _)| *preset).collect();
        Err(format!(
            "unknown wallpaper `{s}`, expected none|#rrggbb|{}",
            names.join("|")
        ))
    }
}

/// Stored as its display string, e.g. `"ocean"` or `"#102030"`.
impl Serialize for Wallpaper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Wallpaper {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(de::Error::custom)
    }
}

fn parse_hex(hex: &str) -> Option<Wallpaper> {
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Wallpaper::Custom(channel(0)?, channel(2)?, channel(4)?))
}
