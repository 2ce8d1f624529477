use approx::assert_relative_eq;
use eventform_algorithms::{
    ClusterMatcher, EventAnalyzer, GapClusterer, GapClustererConfig, HitClusterer,
    OverlapMatcher, OverlapStrategy, TimeAlgorithm,
};
use eventform_core::{Cluster, Event, Hit};

/// Small deterministic generator so failures reproduce.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }
}

/// A time-sorted stream with bursts and quiet stretches.
fn random_hits(seed: u64, count: usize) -> Vec<Hit> {
    let mut rng = XorShift(seed);
    let mut time = 0u64;
    (0..count)
        .map(|_| {
            time += if rng.below(8) == 0 { rng.below(500) } else { rng.below(4) };
            let coordinate = u16::try_from(rng.below(64)).unwrap();
            let weight = u16::try_from(rng.below(100)).unwrap();
            Hit::new(time, coordinate, weight, 0)
        })
        .collect()
}

fn configs() -> Vec<GapClustererConfig> {
    vec![
        GapClustererConfig::new().time_only().with_max_time_gap(0),
        GapClustererConfig::new().time_only().with_max_time_gap(3),
        GapClustererConfig::new()
            .with_max_time_gap(5)
            .with_max_coordinate_gap(0),
        GapClustererConfig::new()
            .with_max_time_gap(10)
            .with_max_coordinate_gap(4),
    ]
}

fn run(config: GapClustererConfig, hits: &[Hit]) -> Vec<Cluster> {
    let mut clusterer = GapClusterer::new(config).unwrap();
    for chunk in hits.chunks(37) {
        clusterer.cluster(chunk);
    }
    clusterer.flush();
    clusterer.take_clusters()
}

#[test]
fn test_every_hit_lands_in_exactly_one_cluster() {
    for seed in [1, 7, 12345] {
        let hits = random_hits(seed, 2000);
        for config in configs() {
            let clusters = run(config, &hits);
            let mut seen: Vec<Hit> = clusters.iter().flat_map(|c| c.hits().to_vec()).collect();
            let mut expected = hits.clone();
            let key = |hit: &Hit| (hit.time, hit.coordinate, hit.weight);
            seen.sort_by_key(key);
            expected.sort_by_key(key);
            assert_eq!(seen, expected);
        }
    }
}

#[test]
fn test_gap_invariant_holds() {
    for seed in [3, 99] {
        let hits = random_hits(seed, 2000);
        for config in configs() {
            for cluster in run(config.clone(), &hits) {
                let mut times: Vec<u64> = cluster.iter().map(|hit| hit.time).collect();
                times.sort_unstable();
                for pair in times.windows(2) {
                    assert!(pair[1] - pair[0] <= config.max_time_gap);
                }
                if let Some(max_gap) = config.max_coordinate_gap {
                    let mut coordinates: Vec<u16> =
                        cluster.iter().map(|hit| hit.coordinate).collect();
                    coordinates.sort_unstable();
                    for pair in coordinates.windows(2) {
                        assert!(pair[1] - pair[0] <= max_gap);
                    }
                }
            }
        }
    }
}

#[test]
fn test_second_flush_adds_nothing() {
    let hits = random_hits(42, 500);
    for config in configs() {
        let mut clusterer = GapClusterer::new(config).unwrap();
        clusterer.cluster(&hits);
        clusterer.flush();
        let first = clusterer.clusters().len();
        let stats = clusterer.statistics();
        clusterer.flush();
        assert_eq!(clusterer.clusters().len(), first);
        assert_eq!(clusterer.statistics(), stats);
    }
}

#[test]
fn test_readiness_threshold_is_exact() {
    for latency in [0u64, 1, 100, 1000] {
        for time_end in [0u64, 50, 5000] {
            let candidate: Cluster = std::iter::once(Hit::new(time_end, 1, 1, 0)).collect();
            let mut matcher = OverlapMatcher::new(OverlapStrategy, latency, 0, 1).unwrap();
            for now in time_end..time_end + latency + 3 {
                matcher.insert_cluster(std::iter::once(Hit::new(now, 1, 1, 0)).collect());
                matcher.insert_cluster(std::iter::once(Hit::new(now, 1, 1, 1)).collect());
                assert_eq!(matcher.now(), now);
                assert_eq!(
                    matcher.ready_to_be_matched(&candidate),
                    now - time_end >= latency,
                    "latency={latency} time_end={time_end} now={now}"
                );
            }
        }
    }
}

#[test]
fn test_single_hit_round_trip() {
    let mut clusterer = GapClusterer::new(GapClustererConfig::new()).unwrap();
    clusterer.cluster(&[Hit::new(100, 5, 10, 0)]);
    clusterer.flush();
    let mut event = Event::new(0, 1);
    for cluster in clusterer.take_clusters() {
        assert!(event.merge(cluster));
    }
    assert!(event.cluster_b().is_empty());

    let reduced = EventAnalyzer::with_algorithm(TimeAlgorithm::CenterOfMass).analyze(&event);
    assert_relative_eq!(reduced.x.center, 5.0);
    assert!(!reduced.good);
    assert_eq!(reduced.time, 100);
}

#[test]
fn test_disjoint_planes_make_two_events() {
    let mut matcher = OverlapMatcher::new(OverlapStrategy, 0, 0, 1).unwrap();
    matcher.insert(0, vec![std::iter::once(Hit::new(0, 10, 1, 0)).collect()]);
    matcher.insert(1, vec![std::iter::once(Hit::new(100, 20, 1, 1)).collect()]);
    assert_eq!(matcher.match_events(true), 2);
    for event in matcher.events() {
        assert!(!event.is_empty());
        assert!(!event.both_planes());
    }
}

#[test]
fn test_center_of_mass_formula() {
    let cluster: Cluster = [Hit::new(0, 1, 1, 0), Hit::new(0, 3, 3, 0)].into_iter().collect();
    assert_relative_eq!(cluster.coordinate_center(), 2.5);
}
