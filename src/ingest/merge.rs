//! Merge policy for newly decoded entities.
//!
//! | Entity | Policy |
//! |--------|--------|
//! | sequences | replace by key; clears in-memory alignment reads |
//! | annotations, variants | append per chromosome, no de-duplication |
//! | tracks | by name; a clash with another load renames to `name_1`, `name_2`, ... |
//! | alignment | the new provider replaces the previous one |
//!
//! Every merge appends one [`LoadedFile`] to the dataset's ledger.

use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::alignment::{AlignmentIndex, AlignmentSource};
use crate::core::dataset::{Dataset, LoadedFile};
use crate::core::track::Track;
use crate::parsing::Decoded;

/// What a merge changed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeSummary {
    /// Sequences whose key was new
    pub sequences_added: usize,
    /// Sequences that replaced a resident one
    pub sequences_replaced: usize,
    pub features_added: usize,
    pub variants_added: usize,
    /// Final names of the tracks this load contributed
    pub tracks: Vec<String>,
    /// Reads installed as the in-memory alignment provider
    pub reads_loaded: usize,
    /// Whether an on-demand alignment provider was installed
    pub on_demand_alignment: bool,
    /// Whether resident in-memory reads were discarded by a sequence load
    pub reads_cleared: bool,
}

/// First free name among `name`, `name_1`, `name_2`, ...
fn unused_track_name(dataset: &Dataset, name: &str) -> String {
    (1..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !dataset.tracks.contains_key(candidate))
        .unwrap_or_else(|| name.to_string())
}

fn merge_tracks(dataset: &mut Dataset, tracks: Vec<Track>, summary: &mut MergeSummary) {
    // Declared name -> name assigned in this load
    let mut assigned: HashMap<String, String> = HashMap::new();

    for mut track in tracks {
        if let Some(existing) = assigned.get(&track.name) {
            if let Some(resident) = dataset.tracks.get_mut(existing) {
                resident.absorb(track);
                continue;
            }
        }

        let declared = track.name.clone();
        let name = if dataset.tracks.contains_key(&declared) {
            let renamed = unused_track_name(dataset, &declared);
            debug!(track = %declared, renamed = %renamed, "Track name taken; renaming");
            renamed
        } else {
            declared.clone()
        };

        track.name = name.clone();
        dataset.tracks.insert(name.clone(), track);
        assigned.insert(declared, name.clone());
        summary.tracks.push(name);
    }
}

/// Merge one load's output into `dataset`
pub fn merge_into(
    dataset: &mut Dataset,
    decoded: Decoded,
    binary_alignment: Option<Box<dyn AlignmentIndex>>,
    ledger_entry: LoadedFile,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    if !decoded.sequences.is_empty() {
        if matches!(dataset.alignment, Some(AlignmentSource::InMemory(_))) {
            dataset.alignment = None;
            summary.reads_cleared = true;
        }
        for (name, sequence) in decoded.sequences {
            if dataset.sequences.insert(name, sequence).is_some() {
                summary.sequences_replaced += 1;
            } else {
                summary.sequences_added += 1;
            }
        }
    }

    for (chromosome, features) in decoded.annotations {
        summary.features_added += features.len();
        dataset
            .annotations
            .entry(chromosome)
            .or_default()
            .extend(features);
    }

    for (chromosome, variants) in decoded.variants {
        summary.variants_added += variants.len();
        dataset
            .variants
            .entry(chromosome)
            .or_default()
            .extend(variants);
    }

    merge_tracks(dataset, decoded.tracks, &mut summary);

    if let Some(reads) = decoded.reads {
        summary.reads_loaded = reads.values().map(Vec::len).sum();
        dataset.alignment = Some(AlignmentSource::InMemory(reads));
    }
    if let Some(index) = binary_alignment {
        summary.on_demand_alignment = true;
        dataset.alignment = Some(AlignmentSource::OnDemand(index));
    }

    dataset.loaded_files.push(ledger_entry);
    summary
}
