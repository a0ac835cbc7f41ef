//! Post-export integrity checks
//!
//! The exported buffer is re-opened from scratch and checked against the
//! canvas model it was produced from, so a broken export is never handed to
//! a caller.

use std::collections::{BTreeSet, HashSet};

use doccanvas_model::CanvasModel;

use crate::archive::OoxmlArchive;
use crate::blocks::{ExtractOptions, StructuralIndex};
use crate::error::{IntegrityViolation, Result};
use crate::import::{asset_id, media_key, MEDIA_DIR};
use crate::relationships::{resolve_target, source_part, Relationships};

/// Every model block that was not deleted must still be present
pub fn verify_blocks(
    model: &CanvasModel,
    index: &StructuralIndex,
    deleted: &BTreeSet<String>,
) -> Result<()> {
    for id in model.block_ids() {
        if deleted.contains(id) {
            continue;
        }
        if !index.contains(id) {
            return Err(IntegrityViolation::BlockLost(id.to_string()).into());
        }
    }
    Ok(())
}

/// Every asset the model references must be a media part reached by a relationship
pub fn verify_assets(model: &CanvasModel, archive: &OoxmlArchive<'_>) -> Result<()> {
    let embedded = embedded_assets(model, archive)?;
    for id in model.asset_ids() {
        if !embedded.contains(&media_key(id)) {
            return Err(IntegrityViolation::AssetNotEmbedded(id.to_string()).into());
        }
    }
    Ok(())
}

/// Re-open an exported buffer and check it against the model
pub fn verify_export(model: &CanvasModel, output: &[u8], deleted: &BTreeSet<String>) -> Result<()> {
    let archive = OoxmlArchive::open(output)?;
    let index = StructuralIndex::build(&archive, &ExtractOptions::for_model(model))?;
    verify_blocks(model, &index, deleted)?;
    verify_assets(model, &archive)?;
    log::debug!(
        "verified {} blocks and {} assets",
        index.len(),
        model.asset_ids().len()
    );
    Ok(())
}

/// Asset ids of media parts that some relationship points at
fn embedded_assets(model: &CanvasModel, archive: &OoxmlArchive<'_>) -> Result<HashSet<String>> {
    let mut embedded = HashSet::new();
    let rels_parts: Vec<&str> = archive
        .part_names()
        .filter(|name| name.ends_with(".rels"))
        .collect();

    for rels_part in rels_parts {
        let Some(source) = source_part(rels_part) else {
            continue;
        };
        let Some(xml) = archive.get(rels_part) else {
            continue;
        };
        let rels = Relationships::parse(xml)?;
        for rel in rels.iter().filter(|r| r.is_internal()) {
            let path = resolve_target(&source, &rel.target);
            if path.starts_with(MEDIA_DIR) && archive.contains(&path) {
                embedded.insert(asset_id(&model.project_id, &path));
            }
        }
    }
    Ok(embedded)
}
