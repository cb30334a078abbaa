//! Shape and spread statistics of TSRs.
//!
//! Metrics are derived from the score distribution of a TSR's member TSSs,
//! with scores summed per position across samples.

use log::info;
use rayon::prelude::*;

use tsrkit_core::config::MetricsConfig;
use tsrkit_core::models::{ShapeClass, ShapeMetrics, TsrMetrics, TsrRecord, TsrTable, TssTable};
use tsrkit_core::Result;

use crate::association::members_by_tsr;

///
/// Collapse `(position, score)` pairs into ascending positions with summed
/// scores. Zero and negative scores carry no mass and are dropped.
///
pub fn position_masses(members: &[(u32, f64)]) -> Vec<(u32, f64)> {
    let mut sorted: Vec<(u32, f64)> = members.iter().copied().filter(|&(_, s)| s > 0.0).collect();
    sorted.sort_by_key(|&(pos, _)| pos);

    let mut masses: Vec<(u32, f64)> = Vec::with_capacity(sorted.len());
    for (pos, score) in sorted {
        match masses.last_mut() {
            Some((last_pos, mass)) if *last_pos == pos => *mass += score,
            _ => masses.push((pos, score)),
        }
    }
    masses
}

///
/// Position at which cumulative score mass reaches `q * total`.
///
/// When the boundary falls inside the mass of position `i`, the result is
/// linearly interpolated between position `i - 1` and position `i`.
/// `masses` must be non-empty, ascending and strictly positive.
///
pub fn mass_quantile(masses: &[(u32, f64)], q: f64) -> f64 {
    let total: f64 = masses.iter().map(|&(_, m)| m).sum();
    let target = q * total;

    let mut cumulative = 0.0;
    for (i, &(pos, mass)) in masses.iter().enumerate() {
        let before = cumulative;
        cumulative += mass;
        if cumulative >= target {
            if i == 0 {
                return pos as f64;
            }
            let prev = masses[i - 1].0 as f64;
            let fraction = (target - before) / mass;
            return prev + fraction * (pos as f64 - prev);
        }
    }
    masses.last().map_or(0.0, |&(pos, _)| pos as f64)
}

///
/// Compute the metrics of a single TSR.
///
/// # Arguments
/// - tsr: the region, for its bounds and dominant TSS
/// - members: `(position, score)` of every member TSS
/// - config: shape classification threshold
///
pub fn tsr_metrics(tsr: &TsrRecord, members: &[(u32, f64)], config: &MetricsConfig) -> TsrMetrics {
    let masses = position_masses(members);
    let total: f64 = masses.iter().map(|&(_, m)| m).sum();
    if masses.is_empty() || !(total > 0.0) {
        return TsrMetrics::Undefined;
    }

    let q25 = mass_quantile(&masses, 0.25);
    let q75 = mass_quantile(&masses, 0.75);
    let iqr_width = q75 - q25 + 1.0;

    let shape_index = 2.0
        + masses
            .iter()
            .map(|&(_, m)| {
                let p = m / total;
                p * p.log2()
            })
            .sum::<f64>();

    let dominant_mass = match tsr.dominant {
        Some(d) => masses
            .iter()
            .find(|&&(pos, _)| pos == d.position)
            .map_or(0.0, |&(_, m)| m),
        None => masses.iter().map(|&(_, m)| m).fold(0.0, f64::max),
    };

    let shape_class = if iqr_width <= config.peaked_max_iqr {
        ShapeClass::Peaked
    } else {
        ShapeClass::Broad
    };

    TsrMetrics::Defined(ShapeMetrics {
        width: tsr.width(),
        iqr_width,
        shape_class,
        shape_index,
        dominant_fraction: dominant_mass / total,
    })
}

///
/// Compute metrics for every TSR from its associated TSS members and store
/// them on the TSR table. Requires a prior association run.
///
/// Returns the number of TSRs whose metrics are undefined.
///
pub fn compute_metrics(tss: &TssTable, tsrs: &mut TsrTable, config: &MetricsConfig) -> Result<usize> {
    config.validate()?;
    let members = members_by_tsr(tss, tsrs)?;

    let metrics: Vec<TsrMetrics> = tsrs
        .records
        .par_iter()
        .zip(members.par_iter())
        .map(|(tsr, rows)| {
            let points: Vec<(u32, f64)> = rows
                .iter()
                .map(|&row| (tss.records[row].position, tss.records[row].score()))
                .collect();
            tsr_metrics(tsr, &points, config)
        })
        .collect();

    let mut undefined = 0;
    for (tsr, m) in tsrs.records.iter_mut().zip(metrics) {
        if m == TsrMetrics::Undefined {
            undefined += 1;
        }
        tsr.metrics = Some(m);
    }

    info!(
        "Computed metrics for {} TSRs ({} undefined)",
        tsrs.len(),
        undefined
    );
    Ok(undefined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use tsrkit_core::models::{DominantTss, Strand, TssRecord};

    use crate::association::associate;

    fn make_tsr(start: u32, end: u32) -> TsrRecord {
        TsrRecord {
            sample: "s1".to_string(),
            samples: vec!["s1".to_string()],
            chr: "chr1".to_string(),
            start,
            end,
            strand: Strand::Plus,
            score: 0.0,
            n_tss: 0,
            n_samples: 0,
            dominant: None,
            metrics: None,
            attributes: Default::default(),
        }
    }

    fn shape(metrics: TsrMetrics) -> ShapeMetrics {
        match metrics {
            TsrMetrics::Defined(m) => m,
            TsrMetrics::Undefined => panic!("expected defined metrics"),
        }
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    // ── quantile tests ──────────────────────────────────────────────────

    #[rstest]
    fn test_position_masses_sums_repeats() {
        let masses = position_masses(&[(12, 1.0), (10, 2.0), (12, 3.0), (11, 0.0)]);
        assert_eq!(masses, vec![(10, 2.0), (12, 4.0)]);
    }

    #[rstest]
    fn test_quantile_interpolates_between_positions() {
        let masses = vec![(100, 1.0), (110, 1.0)];
        assert_close(mass_quantile(&masses, 0.25), 100.0);
        assert_close(mass_quantile(&masses, 0.75), 105.0);
    }

    #[rstest]
    fn test_quantile_exact_boundary() {
        let masses = vec![(10, 1.0), (20, 1.0), (30, 1.0), (40, 1.0)];
        assert_close(mass_quantile(&masses, 0.25), 10.0);
        assert_close(mass_quantile(&masses, 0.75), 30.0);
    }

    // ── metrics tests ───────────────────────────────────────────────────

    #[rstest]
    fn test_single_position_is_peaked() {
        let m = shape(tsr_metrics(&make_tsr(50, 50), &[(50, 7.0)], &MetricsConfig::default()));
        assert_eq!(m.width, 1);
        assert_close(m.iqr_width, 1.0);
        assert_close(m.shape_index, 2.0);
        assert_close(m.dominant_fraction, 1.0);
        assert_eq!(m.shape_class, ShapeClass::Peaked);
    }

    #[rstest]
    fn test_two_equal_positions() {
        let m = shape(tsr_metrics(
            &make_tsr(100, 110),
            &[(100, 1.0), (110, 1.0)],
            &MetricsConfig::default(),
        ));
        assert_eq!(m.width, 11);
        assert_close(m.iqr_width, 6.0);
        assert_close(m.shape_index, 1.0);
        assert_close(m.dominant_fraction, 0.5);
    }

    #[rstest]
    #[case(5.0, ShapeClass::Broad)]
    #[case(6.0, ShapeClass::Peaked)]
    #[case(50.0, ShapeClass::Peaked)]
    fn test_shape_class_threshold(#[case] threshold: f64, #[case] expected: ShapeClass) {
        let config = MetricsConfig {
            peaked_max_iqr: threshold,
        };
        let m = shape(tsr_metrics(&make_tsr(100, 110), &[(100, 1.0), (110, 1.0)], &config));
        assert_eq!(m.shape_class, expected);
    }

    #[rstest]
    fn test_dominant_fraction_uses_dominant_position() {
        let mut tsr = make_tsr(10, 20);
        tsr.dominant = Some(DominantTss {
            index: 0,
            position: 20,
        });
        let m = shape(tsr_metrics(&tsr, &[(10, 3.0), (20, 1.0)], &MetricsConfig::default()));
        assert_close(m.dominant_fraction, 0.25);
    }

    #[rstest]
    fn test_no_members_is_undefined() {
        let tsr = make_tsr(10, 20);
        assert_eq!(
            tsr_metrics(&tsr, &[], &MetricsConfig::default()),
            TsrMetrics::Undefined
        );
        assert_eq!(
            tsr_metrics(&tsr, &[(10, 0.0)], &MetricsConfig::default()),
            TsrMetrics::Undefined
        );
    }

    #[rstest]
    fn test_compute_metrics_on_associated_tables() {
        let mut tss = TssTable::from_records(vec![
            TssRecord::new("s1", "chr1", 100, Strand::Plus, 4),
            TssRecord::new("s1", "chr1", 101, Strand::Plus, 4),
            TssRecord::new("s1", "chr1", 500, Strand::Plus, 2),
        ])
        .unwrap();
        let mut tsrs = TsrTable::from_records(vec![
            make_tsr(100, 101),
            make_tsr(500, 500),
            make_tsr(900, 950),
        ])
        .unwrap();
        associate(&mut tss, &mut tsrs).unwrap();

        let undefined = compute_metrics(&tss, &mut tsrs, &MetricsConfig::default()).unwrap();
        assert_eq!(undefined, 1);
        assert!(tsrs.records[0].metrics.as_ref().unwrap().defined().is_some());
        assert_eq!(tsrs.records[2].metrics, Some(TsrMetrics::Undefined));
    }

    #[rstest]
    fn test_reassociation_clears_metrics() {
        let mut tss =
            TssTable::from_records(vec![TssRecord::new("s1", "chr1", 100, Strand::Plus, 4)])
                .unwrap();
        let mut tsrs = TsrTable::from_records(vec![make_tsr(100, 100)]).unwrap();
        associate(&mut tss, &mut tsrs).unwrap();
        compute_metrics(&tss, &mut tsrs, &MetricsConfig::default()).unwrap();
        assert!(tsrs.records[0].metrics.is_some());

        associate(&mut tss, &mut tsrs).unwrap();
        assert!(tsrs.records[0].metrics.is_none());
    }
}
