use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A token value. Tokens only ever double, so they stay powers of two when the
/// base values are.
pub type Token = u32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Half-open geographic rectangle, `[south_west, north_east)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatLngBounds {
    pub south_west: LatLng,
    pub north_east: LatLng,
}

impl LatLngBounds {
    pub fn center(&self) -> LatLng {
        LatLng {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }
}

/// Discrete grid coordinates. `i` runs with longitude, `j` with latitude.
///
/// On the wire a cell is its id string, `"i,j"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCell {
    pub i: i32,
    pub j: i32,
}

impl GridCell {
    pub const fn new(i: i32, j: i32) -> Self {
        Self { i, j }
    }
}

impl fmt::Display for GridCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.i, self.j)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell id {0:?}")]
pub struct CellIdError(pub String);

impl FromStr for GridCell {
    type Err = CellIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || CellIdError(s.to_string());
        let (i, j) = s.split_once(',').ok_or_else(bad)?;
        let i = i.trim().parse::<i32>().map_err(|_| bad())?;
        let j = j.trim().parse::<i32>().map_err(|_| bad())?;
        Ok(Self { i, j })
    }
}

impl Serialize for GridCell {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GridCell {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    #[default]
    Buttons,
    Geolocation,
}

impl MovementMode {
    /// Startup query parameter. Anything other than `"geolocation"` means buttons.
    pub fn from_query(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("geolocation") => Self::Geolocation,
            _ => Self::Buttons,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Buttons => "buttons",
            Self::Geolocation => "geolocation",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

/// A single reading from the browser's position watch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSample {
    pub lat_lng: LatLng,
    #[serde(default)]
    pub accuracy: f64,
    /// Watch generation the sample was produced under.
    pub watch: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionErrorCode {
    PermissionDenied,
    Unavailable,
    Timeout,
}

/// Shape of the single persisted blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub player_lat_lng: LatLng,
    pub held_token: Option<Token>,
    pub modified_cell_states: Vec<(GridCell, Option<Token>)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellStyle {
    pub token: Option<Token>,
    pub interactable: bool,
}

/// Instructions for the map library running in the browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum MapCommand {
    DrawCell {
        handle: u64,
        cell: GridCell,
        bounds: LatLngBounds,
        style: CellStyle,
    },
    UpdateCell {
        handle: u64,
        style: CellStyle,
    },
    RemoveCell {
        handle: u64,
    },
    MovePlayer {
        #[serde(rename = "latLng")]
        lat_lng: LatLng,
    },
    PanTo {
        #[serde(rename = "latLng")]
        lat_lng: LatLng,
    },
}

/// Instructions for the browser's input sources. Emitted in order: teardown
/// of the old movement source always precedes setup of the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientDirective {
    StopGeolocationWatch,
    StartGeolocationWatch { watch: u64 },
    ShowMovementButtons,
    HideMovementButtons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Info,
    Warning,
    Error,
}

/// Transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub level: MessageLevel,
    pub text: String,
}

impl Message {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub position: LatLng,
    pub cell: GridCell,
    pub held_token: Option<Token>,
    pub movement: MovementMode,
    pub won: bool,
    pub modified_cells: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiUpdate {
    pub event: String,
    pub status: StatusSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub commands: Vec<MapCommand>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<ClientDirective>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
}

impl UiUpdate {
    pub fn new(event: impl Into<String>, status: StatusSnapshot) -> Self {
        Self {
            event: event.into(),
            status,
            commands: Vec::new(),
            directives: Vec::new(),
            message: None,
        }
    }

    pub fn with_commands(mut self, commands: Vec<MapCommand>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_directives(mut self, directives: Vec<ClientDirective>) -> Self {
        self.directives = directives;
        self
    }

    pub fn with_message(mut self, message: Option<Message>) -> Self {
        self.message = message;
        self
    }
}
