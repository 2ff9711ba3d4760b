//! Approval predicate guarding archival, and the save payload it unlocks.

use thiserror::Error;

use crate::models::{DocumentPair, ImageBuffer, MatchState, PayloadSide, RegistryRecord, Slot};
use crate::services::SavePayload;

/// Policy refusal: the document may not be archived as it stands.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SaveRejection {
    #[error("Document is not verified: match it against the approval registry before saving")]
    NotVerified,

    #[error("Document is not approved (registry result: '{hasil_cek}') and cannot be saved")]
    NotApproved { hasil_cek: String },
}

/// The selected record, if the pair may be saved.
pub fn check(pair: &DocumentPair) -> Result<&RegistryRecord, SaveRejection> {
    let record = match (pair.match_state, pair.selected_record.as_ref()) {
        (MatchState::Matched, Some(record)) => record,
        _ => return Err(SaveRejection::NotVerified),
    };
    if !record.is_approved() {
        return Err(SaveRejection::NotApproved {
            hasil_cek: record.match_result.clone(),
        });
    }
    Ok(record)
}

/// Fully rotated images of both slots, as they will be transmitted.
#[derive(Debug, Clone, Default)]
pub struct BakedImages {
    pub side_a: Option<ImageBuffer>,
    pub side_b: Option<ImageBuffer>,
}

impl BakedImages {
    pub fn get(&self, slot: Slot) -> Option<&ImageBuffer> {
        match slot {
            Slot::A => self.side_a.as_ref(),
            Slot::B => self.side_b.as_ref(),
        }
    }
}

/// Assemble the save request. Slots map to `image_front`/`image_back`
/// through [`Slot::payload_side`]; an absent side is sent as `""`.
pub fn build_payload(doc_name: String, record: &RegistryRecord, images: &BakedImages) -> SavePayload {
    let mut image_front = String::new();
    let mut image_back = String::new();
    for slot in [Slot::A, Slot::B] {
        let encoded = images.get(slot).map(ImageBuffer::to_data_url).unwrap_or_default();
        match slot.payload_side() {
            PayloadSide::Front => image_front = encoded,
            PayloadSide::Back => image_back = encoded,
        }
    }

    SavePayload {
        doc_name,
        npsn: record.school_id.clone(),
        sn_bapp: record.document_serial.clone(),
        hasil_cek: record.match_result.clone(),
        image_front,
        image_back,
        nama_sekolah: record.school_name.clone(),
        kode: record.issued_code.clone(),
    }
}
