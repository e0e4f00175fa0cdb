use camp_collate::{Sample, Stat, StatsMode};
use proptest::prelude::*;

fn replicates() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-1.0e6f64..1.0e6, 1..40)
}

proptest! {
    #[test]
    fn box_statistics_are_ordered(values in replicates()) {
        let sample = Sample::new(values.iter().copied());
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let ordered = [
            min,
            sample.get(Stat::Q1),
            sample.get(Stat::Median),
            sample.get(Stat::Q3),
            max,
        ];
        for pair in ordered.windows(2) {
            prop_assert!(pair[0] <= pair[1] + 1e-6, "{:?}", ordered);
        }
        for whisker in [Stat::Whislo, Stat::Whishi] {
            let value = sample.get(whisker);
            prop_assert!(values.contains(&value), "{} = {} is not a sample", whisker, value);
        }
        prop_assert!(sample.get(Stat::Whislo) <= sample.get(Stat::Whishi));
    }

    #[test]
    fn confidence_interval_brackets_mean(values in replicates()) {
        let sample = Sample::new(values.iter().copied());
        let mean = sample.get(Stat::Mean);
        prop_assert!(sample.get(Stat::Ci95Lo) <= mean);
        prop_assert!(mean <= sample.get(Stat::Ci95Hi));
        prop_assert!(sample.get(Stat::Stddev) >= 0.0);
    }

    #[test]
    fn missing_cells_do_not_shift_statistics(values in replicates(), holes in 0usize..5) {
        let with_holes = values.iter().copied().chain(std::iter::repeat(f64::NAN).take(holes));
        prop_assert_eq!(Sample::new(with_holes), Sample::new(values.iter().copied()));
    }
}

#[test]
fn every_mode_starts_with_the_mean() {
    for mode in [StatsMode::None, StatsMode::Conf95, StatsMode::Bw, StatsMode::All] {
        assert_eq!(mode.stats()[0], Stat::Mean);
    }
    assert_eq!(StatsMode::All.stats().len(), 9);
}
