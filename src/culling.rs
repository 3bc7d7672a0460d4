//! Target-level culling (E-value/top-percent/taxon-k) and inner per-target
//! HSP culling by query-range envelopment (`SPEC_FULL.md` §4.4.1 stages 4
//! and 6, §7).

use crate::{config::Config, model::Target, utils::FastMap};

/// Drops targets failing `max_evalue`, re-applies `top_percent` against the
/// refreshed best E-value, and — if `taxon_k` is set — keeps at most that
/// many targets per distinct taxon id, preferring better-scoring targets
/// (§4.4.1 stage 4, the "score-only culling" step).
pub fn cull_targets(targets: &mut Vec<Target>, config: &Config) {
    targets.retain(|t| t.filter_evalue <= config.max_evalue);

    if let Some(top_percent) = config.top_percent
        && let Some(best) = targets.iter().map(|t| t.filter_score).max()
    {
        let threshold = f64::from(best) * (1.0 - top_percent / 100.0);
        targets.retain(|t| f64::from(t.filter_score) >= threshold);
    }

    if let Some(k) = config.taxon_k {
        targets.sort_by(|a, b| b.filter_score.cmp(&a.filter_score));
        let mut seen: FastMap<u32, usize> = crate::utils::fast_map();
        targets.retain(|t| {
            t.taxon_ids.iter().any(|&taxon| {
                let count = seen.entry(taxon).or_insert(0);
                let keep = *count < k;
                if keep {
                    *count += 1;
                }
                keep
            }) || t.taxon_ids.is_empty()
        });
    }
}

/// Truncates the final, best-first-sorted per-query target list to
/// `config.max_target_seqs` (§8: "`max_target_seqs = 1` → at most one target
/// per query"). Call after the last re-sort of a pipeline's output, not at
/// the intermediate score-only culling stage, since earlier stages still
/// need the wider `Config::rank_keep` window to pick a good final set.
pub fn truncate_to_max_target_seqs(targets: &mut Vec<Target>, config: &Config) {
    if targets.len() > config.max_target_seqs {
        targets.truncate(config.max_target_seqs);
    }
}

/// Sorts a target's HSPs by score descending and drops any HSP whose query
/// range is ≥ 50% enveloped by a higher-scoring HSP, restoring `filter_score`
/// to the best remaining HSP afterward (§4.4.1 stage 6, §3 invariant).
pub fn inner_cull(target: &mut Target) {
    target.hsps.sort_by(|a, b| b.score.cmp(&a.score));

    let mut kept_indices: Vec<usize> = Vec::new();
    for (i, hsp) in target.hsps.iter().enumerate() {
        let enveloped = kept_indices.iter().any(|&k| target.hsps[k].envelops(hsp));
        if !enveloped {
            kept_indices.push(i);
        }
    }

    let kept: Vec<_> = kept_indices.into_iter().map(|i| target.hsps[i].clone()).collect();
    target.hsps = kept;
    target.refresh_filter_from_hsps();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::Hsp, transcript::Transcript};

    fn make_target(score: i32, evalue: f64) -> Target {
        let mut t = Target::new(0, 0..0);
        t.filter_score = score;
        t.filter_evalue = evalue;
        t
    }

    #[test]
    fn truncate_to_max_target_seqs_keeps_only_the_configured_count() {
        let mut config = Config::default();
        config.max_target_seqs = 1;
        let mut targets = vec![make_target(100, 1e-20), make_target(90, 1e-18)];
        truncate_to_max_target_seqs(&mut targets, &config);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].filter_score, 100);
    }

    #[test]
    fn cull_targets_drops_high_evalue() {
        let config = Config::default();
        let mut targets = vec![make_target(100, 1e-20), make_target(10, 100.0)];
        cull_targets(&mut targets, &config);
        assert_eq!(targets.len(), 1);
    }

    fn make_hsp(score: i32, s: u32, e: u32) -> Hsp {
        Hsp {
            frame: 0,
            score,
            evalue: 1.0 / f64::from(score.max(1)),
            bit_score: f64::from(score),
            query_range: s..e,
            subject_range: 0..(e - s) as u64,
            query_source_range: s..e,
            transcript: Transcript::default(),
            identities: 0,
            mismatches: 0,
            gap_openings: 0,
            positives: 0,
            length: e - s,
        }
    }

    #[test]
    fn inner_cull_drops_enveloped_weaker_hsp() {
        let mut target = Target::new(0, 0..0);
        target.hsps = vec![make_hsp(50, 10, 60), make_hsp(200, 0, 100)];
        inner_cull(&mut target);
        assert_eq!(target.hsps.len(), 1);
        assert_eq!(target.filter_score, 200);
    }

    #[test]
    fn inner_cull_keeps_disjoint_hsps() {
        let mut target = Target::new(0, 0..0);
        target.hsps = vec![make_hsp(200, 0, 100), make_hsp(150, 200, 300)];
        inner_cull(&mut target);
        assert_eq!(target.hsps.len(), 2);
    }
}
