//! Moving image content between document slots.
//!
//! A swap exchanges an image together with its pending rotation. Text,
//! labels and verification state stay with the document; re-identifying
//! after a swap is a separate retry.

use crate::models::{DocumentPair, SlotContent, SlotRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    Swapped,
    /// Source and target are the same slot.
    NoOp,
    /// One of the addressed documents is not in the batch.
    MissingDocument,
}

/// Exchange the contents of two slots, within one pair or across two.
///
/// Both slots are taken out before either is written, so a same-pair swap
/// never reads a slot after overwriting it.
pub fn swap(documents: &mut [DocumentPair], source: SlotRef, target: SlotRef) -> SwapOutcome {
    if source == target {
        return SwapOutcome::NoOp;
    }

    let find = |id| documents.iter().position(|d: &DocumentPair| d.id == id);
    let (Some(si), Some(ti)) = (find(source.document), find(target.document)) else {
        return SwapOutcome::MissingDocument;
    };

    if si == ti {
        let pair = &mut documents[si];
        let from_source = pair.take_slot(source.slot);
        let from_target = pair.take_slot(target.slot);
        pair.put_slot(target.slot, from_source);
        pair.put_slot(source.slot, from_target);
    } else {
        let (src, tgt) = pair_mut(documents, si, ti);
        let from_source: SlotContent = src.take_slot(source.slot);
        let from_target = tgt.take_slot(target.slot);
        tgt.put_slot(target.slot, from_source);
        src.put_slot(source.slot, from_target);
    }

    tracing::debug!(
        source = %source.document,
        source_slot = %source.slot,
        target = %target.document,
        target_slot = %target.slot,
        "Swapped slot contents"
    );
    SwapOutcome::Swapped
}

/// Two distinct mutable elements, returned in `(a, b)` order.
fn pair_mut(documents: &mut [DocumentPair], a: usize, b: usize) -> (&mut DocumentPair, &mut DocumentPair) {
    if a < b {
        let (left, right) = documents.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = documents.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
