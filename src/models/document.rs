use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use super::approval::RegistryRecord;
use super::enums::{MatchState, OcrState, Slot};
use super::image::ImageBuffer;

/// Slot whose image carries the printed "Nomor" and is OCR'd.
///
/// The operator UI labels it the front side, and the save payload sends it as
/// `image_front`, whatever the scanner called it.
pub const IDENTIFICATION_SLOT: Slot = Slot::B;

/// Recognized text recorded when the OCR engine itself fails.
pub const OCR_FAILURE_TEXT: &str = "(OCR failed)";

/// Label given to a document whose identifier could not be extracted.
pub fn placeholder_name(position: usize) -> String {
    format!("Document #{position}")
}

/// Stable identity of a document within a batch (survives deletes/reorders).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Which field of the save payload a slot feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSide {
    Front,
    Back,
}

impl Slot {
    /// Identification slot goes out as `image_front`, the other as `image_back`.
    pub fn payload_side(self) -> PayloadSide {
        if self == IDENTIFICATION_SLOT {
            PayloadSide::Front
        } else {
            PayloadSide::Back
        }
    }
}

/// Addresses one image slot of one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRef {
    pub document: DocumentId,
    pub slot: Slot,
}

impl SlotRef {
    pub fn new(document: DocumentId, slot: Slot) -> Self {
        Self { document, slot }
    }
}

// ═══════════════════════════════════════════
// Rotation
// ═══════════════════════════════════════════

/// Quarter-turn rotation, clockwise. Serialized as integer degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalize any angle: modulo 360, then snapped to the nearest quarter turn.
    pub fn from_degrees(degrees: i64) -> Self {
        match ((degrees.rem_euclid(360) + 45) / 90) % 4 {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn compose(self, other: Rotation) -> Rotation {
        Self::from_degrees(i64::from(self.degrees()) + i64::from(other.degrees()))
    }

    /// One more clockwise quarter turn.
    pub fn turned(self) -> Rotation {
        self.compose(Rotation::Deg90)
    }

    pub fn is_identity(self) -> bool {
        self == Self::Deg0
    }
}

impl Serialize for Rotation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.degrees())
    }
}

impl<'de> Deserialize<'de> for Rotation {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Rotation::from_degrees)
    }
}

// ═══════════════════════════════════════════
// DocumentPair
// ═══════════════════════════════════════════

/// Image content of one slot, moved as a unit by swaps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SlotContent {
    pub image: Option<ImageBuffer>,
    pub rotation: Rotation,
}

/// One scanned physical document: two captured sides plus verification state.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentPair {
    pub id: DocumentId,
    pub side_a: Option<ImageBuffer>,
    pub side_b: Option<ImageBuffer>,
    /// Pending (not yet baked) rotation of `side_a`.
    pub rotation_a: Rotation,
    /// Pending (not yet baked) rotation of `side_b`.
    pub rotation_b: Rotation,
    /// Raw OCR output of the identification slot, or [`OCR_FAILURE_TEXT`].
    pub recognized_text: Option<String>,
    /// Operator-editable label; the extracted identifier when OCR succeeds.
    pub display_name: String,
    pub ocr_state: OcrState,
    pub match_state: MatchState,
    pub candidates: Vec<RegistryRecord>,
    pub selected_record: Option<RegistryRecord>,
    pub is_saving: bool,
    pub is_saved: bool,
    pub is_rotating: bool,
    pub scanned_at: DateTime<Utc>,
}

impl DocumentPair {
    pub fn new(side_a: Option<ImageBuffer>, side_b: Option<ImageBuffer>) -> Self {
        Self {
            id: DocumentId::new(),
            side_a,
            side_b,
            rotation_a: Rotation::Deg0,
            rotation_b: Rotation::Deg0,
            recognized_text: None,
            display_name: String::new(),
            ocr_state: OcrState::Idle,
            match_state: MatchState::Idle,
            candidates: Vec::new(),
            selected_record: None,
            is_saving: false,
            is_saved: false,
            is_rotating: false,
            scanned_at: Utc::now(),
        }
    }

    pub fn image(&self, slot: Slot) -> Option<&ImageBuffer> {
        match slot {
            Slot::A => self.side_a.as_ref(),
            Slot::B => self.side_b.as_ref(),
        }
    }

    pub fn set_image(&mut self, slot: Slot, image: Option<ImageBuffer>) {
        match slot {
            Slot::A => self.side_a = image,
            Slot::B => self.side_b = image,
        }
    }

    pub fn rotation(&self, slot: Slot) -> Rotation {
        match slot {
            Slot::A => self.rotation_a,
            Slot::B => self.rotation_b,
        }
    }

    pub fn set_rotation(&mut self, slot: Slot, rotation: Rotation) {
        match slot {
            Slot::A => self.rotation_a = rotation,
            Slot::B => self.rotation_b = rotation,
        }
    }

    /// Move a slot's image and pending rotation out, leaving it empty.
    pub fn take_slot(&mut self, slot: Slot) -> SlotContent {
        let content = SlotContent {
            image: match slot {
                Slot::A => self.side_a.take(),
                Slot::B => self.side_b.take(),
            },
            rotation: self.rotation(slot),
        };
        self.set_rotation(slot, Rotation::Deg0);
        content
    }

    pub fn put_slot(&mut self, slot: Slot, content: SlotContent) {
        self.set_image(slot, content.image);
        self.set_rotation(slot, content.rotation);
    }

    pub fn identification_image(&self) -> Option<&ImageBuffer> {
        self.image(IDENTIFICATION_SLOT)
    }

    /// The identifier used for primary registry lookups: the trimmed label.
    pub fn identifier(&self) -> Option<&str> {
        let name = self.display_name.trim();
        (!name.is_empty()).then_some(name)
    }

    /// Label for persistence, falling back to the positional placeholder.
    pub fn label_or_placeholder(&self, position: usize) -> String {
        self.identifier()
            .map(str::to_string)
            .unwrap_or_else(|| placeholder_name(position))
    }
}
