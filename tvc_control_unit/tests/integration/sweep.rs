//! Property tests for sweep generation.

use proptest::prelude::*;
use tvc_control_unit::policy::SegmentTable;
use tvc_control_unit::sweep::{SweepRange, generate};

fn range() -> impl Strategy<Value = SweepRange> {
    (-50.0f64..50.0, 0.0f64..20.0, 0.5f64..5.0)
        .prop_map(|(min, span, step)| SweepRange::new(min, min + span, step))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn length_is_product_of_counts(
        v in range(),
        a in range(),
        p in range(),
        dual in any::<bool>(),
    ) {
        let s = generate(&v, &a, &p, dual).unwrap();
        let passes = if dual { 2 } else { 1 };
        prop_assert_eq!(s.len(), v.count() * a.count() * p.count() * passes);
        prop_assert_eq!(s.velocity.len(), s.amplitude.len());
        prop_assert_eq!(s.velocity.len(), s.phase.len());
        prop_assert!(SegmentTable::try_from(s).is_ok());
    }

    #[test]
    fn values_stay_in_range(v in range(), a in range(), p in range(), dual in any::<bool>()) {
        let s = generate(&v, &a, &p, dual).unwrap();
        let within = |x: f64, r: &SweepRange| x >= r.min - 1e-9 && x <= r.max + 1e-5;
        for point in s.points() {
            prop_assert!(within(point.velocity, &v));
            prop_assert!(within(point.amplitude, &a));
            prop_assert!(within(point.phase, &p));
        }
    }

    #[test]
    fn velocity_never_decreases(v in range(), a in range(), dual in any::<bool>()) {
        let s = generate(&v, &a, &SweepRange::fixed(0.0), dual).unwrap();
        prop_assert!(s.velocity.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn dual_pass_climbs_then_descends(v in range(), a in range()) {
        let s = generate(&v, &a, &SweepRange::fixed(0.0), true).unwrap();
        let na = a.count();
        for block in s.amplitude.chunks(2 * na) {
            let (up, down) = block.split_at(na);
            prop_assert!(up.windows(2).all(|w| w[1] > w[0]));
            prop_assert!(down.windows(2).all(|w| w[1] <= w[0]));
            prop_assert!(down[0] + 1e-5 >= up[na - 1]);
        }
    }

    #[test]
    fn phase_restarts_for_every_amplitude(a in range(), p in range()) {
        let s = generate(&SweepRange::fixed(1.0), &a, &p, false).unwrap();
        let np = p.count();
        for block in s.phase.chunks(np) {
            prop_assert_eq!(block[0], p.min);
            prop_assert!(block.windows(2).all(|w| w[1] > w[0]));
        }
    }
}
