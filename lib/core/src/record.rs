//! Song records as they arrive from the loader.
//!
//! Input rows are loosely typed: numeric columns may hold numbers, booleans
//! or strings (`"1.2e-3"`, `"True"`), and the artist column may be a
//! `;`-delimited string, a bracketed list or a JSON array. Everything is
//! coerced lazily so a malformed value becomes "missing" instead of failing
//! the row.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Numeric attributes in their canonical (fused-vector) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericAttribute {
    Danceability,
    Energy,
    Loudness,
    Speechiness,
    Acousticness,
    Instrumentalness,
    Liveness,
    Valence,
    Tempo,
    DurationMs,
    Explicit,
    Popularity,
}

impl NumericAttribute {
    pub const ALL: [NumericAttribute; 12] = [
        NumericAttribute::Danceability,
        NumericAttribute::Energy,
        NumericAttribute::Loudness,
        NumericAttribute::Speechiness,
        NumericAttribute::Acousticness,
        NumericAttribute::Instrumentalness,
        NumericAttribute::Liveness,
        NumericAttribute::Valence,
        NumericAttribute::Tempo,
        NumericAttribute::DurationMs,
        NumericAttribute::Explicit,
        NumericAttribute::Popularity,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            NumericAttribute::Danceability => "danceability",
            NumericAttribute::Energy => "energy",
            NumericAttribute::Loudness => "loudness",
            NumericAttribute::Speechiness => "speechiness",
            NumericAttribute::Acousticness => "acousticness",
            NumericAttribute::Instrumentalness => "instrumentalness",
            NumericAttribute::Liveness => "liveness",
            NumericAttribute::Valence => "valence",
            NumericAttribute::Tempo => "tempo",
            NumericAttribute::DurationMs => "duration_ms",
            NumericAttribute::Explicit => "explicit",
            NumericAttribute::Popularity => "popularity",
        }
    }

    /// Position in the canonical order.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for NumericAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Text fields in their canonical (fused-vector) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextField {
    Artists,
    Genre,
    Album,
    Track,
}

impl TextField {
    pub const ALL: [TextField; 4] = [
        TextField::Artists,
        TextField::Genre,
        TextField::Album,
        TextField::Track,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TextField::Artists => "artists",
            TextField::Genre => "genre",
            TextField::Album => "album",
            TextField::Track => "track",
        }
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Parse a field name as used by the REST API and CLI.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "artists" | "artist" => Some(TextField::Artists),
            "genre" | "track_genre" => Some(TextField::Genre),
            "album" | "album_name" => Some(TextField::Album),
            "track" | "track_name" => Some(TextField::Track),
            _ => None,
        }
    }
}

impl fmt::Display for TextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A loosely typed cell value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Scalar {
    /// Coerce to a finite number; `None` when the value is unparsable.
    pub fn coerce(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Number(_) => None,
            Scalar::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Scalar::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("true") {
                    Some(1.0)
                } else if s.eq_ignore_ascii_case("false") {
                    Some(0.0)
                } else {
                    s.parse::<f64>().ok().filter(|n| n.is_finite())
                }
            }
        }
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// The artist column in any of the shapes the loaders produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArtistList {
    List(Vec<String>),
    Text(String),
}

impl ArtistList {
    /// Artist names, order preserved, blanks dropped, duplicates kept.
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<String> = match self {
            ArtistList::List(names) => names.clone(),
            ArtistList::Text(text) => split_artist_text(text),
        };
        raw.into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

fn split_artist_text(text: &str) -> Vec<String> {
    let text = text.trim();
    if text.starts_with('[') && text.ends_with(']') {
        if let Ok(names) = serde_json::from_str::<Vec<String>>(text) {
            return names;
        }
        let inner = &text[1..text.len() - 1];
        return inner
            .split([',', ';'])
            .map(|s| s.trim().trim_matches(|c| c == '"' || c == '\'').to_string())
            .collect();
    }
    text.split(';').map(str::to_string).collect()
}

fn deserialize_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// One input row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SongRecord {
    #[serde(default, deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub album_name: Option<String>,
    #[serde(default)]
    pub track_name: Option<String>,
    #[serde(default)]
    pub artists: Option<ArtistList>,
    #[serde(default)]
    pub track_genre: Option<String>,
    #[serde(default)]
    pub popularity: Option<Scalar>,
    #[serde(default)]
    pub duration_ms: Option<Scalar>,
    #[serde(default)]
    pub explicit: Option<Scalar>,
    #[serde(default)]
    pub danceability: Option<Scalar>,
    #[serde(default)]
    pub energy: Option<Scalar>,
    #[serde(default)]
    pub loudness: Option<Scalar>,
    #[serde(default)]
    pub speechiness: Option<Scalar>,
    #[serde(default)]
    pub acousticness: Option<Scalar>,
    #[serde(default)]
    pub instrumentalness: Option<Scalar>,
    #[serde(default)]
    pub liveness: Option<Scalar>,
    #[serde(default)]
    pub valence: Option<Scalar>,
    #[serde(default)]
    pub tempo: Option<Scalar>,
}

impl SongRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    fn numeric_slot(&self, attr: NumericAttribute) -> &Option<Scalar> {
        match attr {
            NumericAttribute::Danceability => &self.danceability,
            NumericAttribute::Energy => &self.energy,
            NumericAttribute::Loudness => &self.loudness,
            NumericAttribute::Speechiness => &self.speechiness,
            NumericAttribute::Acousticness => &self.acousticness,
            NumericAttribute::Instrumentalness => &self.instrumentalness,
            NumericAttribute::Liveness => &self.liveness,
            NumericAttribute::Valence => &self.valence,
            NumericAttribute::Tempo => &self.tempo,
            NumericAttribute::DurationMs => &self.duration_ms,
            NumericAttribute::Explicit => &self.explicit,
            NumericAttribute::Popularity => &self.popularity,
        }
    }

    fn numeric_slot_mut(&mut self, attr: NumericAttribute) -> &mut Option<Scalar> {
        match attr {
            NumericAttribute::Danceability => &mut self.danceability,
            NumericAttribute::Energy => &mut self.energy,
            NumericAttribute::Loudness => &mut self.loudness,
            NumericAttribute::Speechiness => &mut self.speechiness,
            NumericAttribute::Acousticness => &mut self.acousticness,
            NumericAttribute::Instrumentalness => &mut self.instrumentalness,
            NumericAttribute::Liveness => &mut self.liveness,
            NumericAttribute::Valence => &mut self.valence,
            NumericAttribute::Tempo => &mut self.tempo,
            NumericAttribute::DurationMs => &mut self.duration_ms,
            NumericAttribute::Explicit => &mut self.explicit,
            NumericAttribute::Popularity => &mut self.popularity,
        }
    }

    /// Coerced numeric value, `None` when absent or unparsable.
    pub fn numeric(&self, attr: NumericAttribute) -> Option<f64> {
        self.numeric_slot(attr).as_ref().and_then(Scalar::coerce)
    }

    pub fn with_numeric(mut self, attr: NumericAttribute, value: impl Into<Scalar>) -> Self {
        *self.numeric_slot_mut(attr) = Some(value.into());
        self
    }

    pub fn with_artists<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.artists = Some(ArtistList::List(names.into_iter().map(Into::into).collect()));
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.track_genre = Some(genre.into());
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album_name = Some(album.into());
        self
    }

    pub fn with_track(mut self, track: impl Into<String>) -> Self {
        self.track_name = Some(track.into());
        self
    }

    pub fn artist_names(&self) -> Vec<String> {
        self.artists.as_ref().map(ArtistList::names).unwrap_or_default()
    }

    /// Text to embed for `field`, `None` when the field is blank.
    ///
    /// Artist lists are joined with a single space, order preserved.
    pub fn text(&self, field: TextField) -> Option<String> {
        let text = match field {
            TextField::Artists => self.artist_names().join(" "),
            TextField::Genre => self.track_genre.clone().unwrap_or_default(),
            TextField::Album => self.album_name.clone().unwrap_or_default(),
            TextField::Track => self.track_name.clone().unwrap_or_default(),
        };
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Single free-text description of the song, used when songs are
    /// encoded through the text-only contract.
    pub fn describe(&self) -> String {
        let mut out = self.text(TextField::Track).unwrap_or_default();
        let artists = self.artist_names();
        if !artists.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str("by ");
            out.push_str(&artists.join(", "));
        }
        if let Some(album) = self.text(TextField::Album) {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str("from ");
            out.push_str(&album);
        }
        if let Some(genre) = self.text(TextField::Genre) {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(&genre);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(Scalar::from(0.5).coerce(), Some(0.5));
        assert_eq!(Scalar::from(true).coerce(), Some(1.0));
        assert_eq!(Scalar::from("False").coerce(), Some(0.0));
        assert_eq!(Scalar::from("1.5e-3").coerce(), Some(0.0015));
        assert_eq!(Scalar::from(" 42 ").coerce(), Some(42.0));
        assert_eq!(Scalar::from("n/a").coerce(), None);
        assert_eq!(Scalar::from("NaN").coerce(), None);
    }

    #[test]
    fn test_artist_list_shapes() {
        let plain = ArtistList::Text("Kanye West; Jay-Z".to_string());
        assert_eq!(plain.names(), vec!["Kanye West", "Jay-Z"]);

        let bracketed = ArtistList::Text(r#"["Kanye West","Jay-Z"]"#.to_string());
        assert_eq!(bracketed.names(), vec!["Kanye West", "Jay-Z"]);

        let loose = ArtistList::Text(r#"["Kanye West";"Jay-Z"]"#.to_string());
        assert_eq!(loose.names(), vec!["Kanye West", "Jay-Z"]);

        let list = ArtistList::List(vec!["A".into(), " ".into(), "A".into()]);
        assert_eq!(list.names(), vec!["A", "A"]);
    }

    #[test]
    fn test_deserialize_loose_row() {
        let row = json!({
            "id": 17,
            "album_name": "Graduation",
            "track_name": "Stronger",
            "artists": "Kanye West",
            "track_genre": "hip-hop",
            "popularity": "81",
            "explicit": "True",
            "danceability": 0.617,
            "tempo": "not a number"
        });
        let record: SongRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.id, "17");
        assert_eq!(record.numeric(NumericAttribute::Popularity), Some(81.0));
        assert_eq!(record.numeric(NumericAttribute::Explicit), Some(1.0));
        assert_eq!(record.numeric(NumericAttribute::Danceability), Some(0.617));
        assert_eq!(record.numeric(NumericAttribute::Tempo), None);
        assert_eq!(record.numeric(NumericAttribute::Energy), None);
    }

    #[test]
    fn test_text_fields() {
        let record = SongRecord::new("1")
            .with_artists(["Kanye West", "Jay-Z"])
            .with_genre("  ")
            .with_track("Otis");
        assert_eq!(record.text(TextField::Artists).as_deref(), Some("Kanye West Jay-Z"));
        assert_eq!(record.text(TextField::Genre), None);
        assert_eq!(record.text(TextField::Album), None);
        assert_eq!(record.describe(), "Otis by Kanye West, Jay-Z");
    }

    #[test]
    fn test_canonical_order() {
        for (i, attr) in NumericAttribute::ALL.iter().enumerate() {
            assert_eq!(attr.index(), i);
        }
        for (i, field) in TextField::ALL.iter().enumerate() {
            assert_eq!(field.index(), i);
        }
        assert_eq!(TextField::parse("track_genre"), Some(TextField::Genre));
        assert_eq!(TextField::parse("lyrics"), None);
    }
}
