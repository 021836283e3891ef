//! 选择算法与节点集合测试

mod common;

use common::{node, service, weighted, weighted_service};
use flare_balancer::error::BalancerError;
use flare_balancer::selector::{
    filter_fn, metadata_filter, version_filter, Balancer, ConsistentHashBalancer,
    DefaultWeightedBuilder, HashRing, NodeFilter, NodeSet, PickContext, RandomBalancer, WeightedNode,
    WeightedNodeBuilder, WrrBalancer,
};
use std::collections::HashMap;
use std::sync::Arc;

fn count_picks(
    balancer: &dyn Balancer,
    nodes: &[Arc<dyn WeightedNode>],
    ctx: &PickContext,
    rounds: usize,
) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for _ in 0..rounds {
        let picked = balancer.pick(ctx, nodes).unwrap();
        *counts.entry(picked.address().to_string()).or_insert(0) += 1;
    }
    counts
}

#[test]
fn test_wrr_distribution_matches_weights() {
    let nodes = vec![
        weighted(weighted_service("a", "10.0.0.1:9000", 50)),
        weighted(weighted_service("b", "10.0.0.2:9000", 30)),
        weighted(weighted_service("c", "10.0.0.3:9000", 20)),
    ];
    let wrr = WrrBalancer::new();
    let counts = count_picks(&wrr, &nodes, &PickContext::new(), 1000);

    assert_eq!(counts["10.0.0.1:9000"], 500);
    assert_eq!(counts["10.0.0.2:9000"], 300);
    assert_eq!(counts["10.0.0.3:9000"], 200);
}

#[test]
fn test_wrr_long_run_is_proportional() {
    let nodes = vec![
        weighted(weighted_service("a", "10.0.0.1:9000", 7)),
        weighted(weighted_service("b", "10.0.0.2:9000", 2)),
        weighted(weighted_service("c", "10.0.0.3:9000", 1)),
    ];
    let wrr = WrrBalancer::new();
    let counts = count_picks(&wrr, &nodes, &PickContext::new(), 100_000);

    assert_eq!(counts["10.0.0.1:9000"], 70_000);
    assert_eq!(counts["10.0.0.2:9000"], 20_000);
    assert_eq!(counts["10.0.0.3:9000"], 10_000);
}

#[test]
fn test_wrr_sequence_is_smooth() {
    let nodes = vec![
        weighted(weighted_service("a", "a:1", 5)),
        weighted(weighted_service("b", "b:1", 1)),
        weighted(weighted_service("c", "c:1", 1)),
    ];
    let wrr = WrrBalancer::new();
    let ctx = PickContext::new();
    let sequence: Vec<String> = (0..7)
        .map(|_| wrr.pick(&ctx, &nodes).unwrap().address().to_string())
        .collect();

    assert_eq!(sequence, vec!["a:1", "a:1", "b:1", "a:1", "c:1", "a:1", "a:1"]);
    // 一个完整周期后所有当前权重归零
    assert_eq!(wrr.current_weight("a:1"), Some(0));
    assert_eq!(wrr.current_weight("b:1"), Some(0));
    assert_eq!(wrr.current_weight("c:1"), Some(0));
}

#[test]
fn test_wrr_zero_weight_node_never_wins_against_positive() {
    let nodes = vec![
        weighted(weighted_service("a", "a:1", 0)),
        weighted(weighted_service("b", "b:1", 10)),
    ];
    let wrr = WrrBalancer::new();
    let counts = count_picks(&wrr, &nodes, &PickContext::new(), 100);
    assert_eq!(counts.get("a:1"), None);
    assert_eq!(counts["b:1"], 100);
}

#[test]
fn test_wrr_handles_extreme_weights() {
    let nodes = vec![
        weighted(weighted_service("a", "a:1", i64::MAX)),
        weighted(weighted_service("b", "b:1", i64::MAX)),
        weighted(weighted_service("c", "c:1", 1)),
    ];
    let wrr = WrrBalancer::new();
    let ctx = PickContext::new();
    let sequence: Vec<String> = (0..4)
        .map(|_| wrr.pick(&ctx, &nodes).unwrap().address().to_string())
        .collect();
    assert_eq!(sequence, vec!["a:1", "b:1", "a:1", "b:1"]);
}

#[test]
fn test_wrr_forgets_removed_addresses() {
    let all = vec![
        weighted(weighted_service("a", "a:1", 3)),
        weighted(weighted_service("b", "b:1", 1)),
    ];
    let wrr = WrrBalancer::new();
    wrr.update(&all);
    wrr.pick(&PickContext::new(), &all).unwrap();
    assert!(wrr.current_weight("b:1").is_some());

    wrr.update(&all[..1]);
    assert_eq!(wrr.current_weight("b:1"), None);
    assert!(wrr.current_weight("a:1").is_some());
}

#[test]
fn test_missing_weight_uses_default() {
    let plain = weighted(service("a", "a:1"));
    assert_eq!(plain.weight(), 100);

    let invalid = weighted(service("b", "b:1").with_metadata("weight", "heavy"));
    assert_eq!(invalid.weight(), 100);

    let custom = DefaultWeightedBuilder::new(10).build(node(service("c", "c:1")));
    assert_eq!(custom.weight(), 10);
    assert_eq!(custom.raw().address(), "c:1");
}

#[test]
fn test_random_is_roughly_uniform() {
    let nodes = vec![
        weighted(service("a", "a:1")),
        weighted(service("b", "b:1")),
        weighted(service("c", "c:1")),
    ];
    let random = RandomBalancer::with_seed(7);
    let counts = count_picks(&random, &nodes, &PickContext::new(), 30_000);

    for addr in ["a:1", "b:1", "c:1"] {
        let n = counts[addr];
        assert!((9_000..=11_000).contains(&n), "{addr} picked {n} times");
    }
}

#[test]
fn test_empty_candidates_fail_for_every_balancer() {
    let ctx = PickContext::new().with_hash_key("user-1");
    let balancers: Vec<Arc<dyn Balancer>> = vec![
        Arc::new(RandomBalancer::new()),
        Arc::new(WrrBalancer::new()),
        Arc::new(ConsistentHashBalancer::new()),
    ];
    for balancer in balancers {
        let err = balancer.pick(&ctx, &[]).unwrap_err();
        assert_eq!(err, BalancerError::NoAvailableNode, "{}", balancer.name());
    }
}

#[test]
fn test_consistent_hash_is_sticky() {
    let nodes = vec![
        weighted(service("a", "a:1")),
        weighted(service("b", "b:1")),
        weighted(service("c", "c:1")),
    ];
    let balancer = ConsistentHashBalancer::new();
    balancer.update(&nodes);
    let ctx = PickContext::new().with_hash_key("user-42");

    let first = balancer.pick(&ctx, &nodes).unwrap().address().to_string();
    for _ in 0..100 {
        assert_eq!(balancer.pick(&ctx, &nodes).unwrap().address(), first);
    }
    assert_eq!(balancer.ring().len(), 3);
}

#[test]
fn test_consistent_hash_follows_membership() {
    let all = vec![
        weighted(service("a", "a:1")),
        weighted(service("b", "b:1")),
        weighted(service("c", "c:1")),
    ];
    let balancer = ConsistentHashBalancer::new();
    balancer.update(&all);

    let keys: Vec<String> = (0..500).map(|i| format!("key-{i}")).collect();
    let before: Vec<String> = keys
        .iter()
        .map(|k| {
            let ctx = PickContext::new().with_hash_key(k.clone());
            balancer.pick(&ctx, &all).unwrap().address().to_string()
        })
        .collect();

    let remaining: Vec<Arc<dyn WeightedNode>> =
        all.iter().filter(|n| n.address() != "b:1").cloned().collect();
    balancer.update(&remaining);
    for (key, owner) in keys.iter().zip(&before) {
        let ctx = PickContext::new().with_hash_key(key.clone());
        let now = balancer.pick(&ctx, &remaining).unwrap();
        assert_ne!(now.address(), "b:1");
        if owner != "b:1" {
            assert_eq!(now.address(), owner, "key {key} moved without need");
        }
    }
    assert!(!balancer.ring().contains(&"b:1".to_string()));
}

#[test]
fn test_ring_lookup_is_stable() {
    let ring = HashRing::with_replicas(32);
    for name in ["A", "B", "C"] {
        ring.add(name.to_string());
    }
    let owner = ring.get("k1").unwrap();
    for _ in 0..100 {
        assert_eq!(ring.get("k1").unwrap(), owner);
    }
}

#[test]
fn test_ring_removal_moves_about_one_nth() {
    let ring = HashRing::new();
    for name in ["A", "B", "C"] {
        ring.add(name.to_string());
    }
    let keys: Vec<String> = (0..3_000).map(|i| format!("session-{i}")).collect();
    let before: Vec<String> = keys.iter().map(|k| ring.get(k).unwrap()).collect();

    assert!(ring.remove(&"C".to_string()));
    let mut moved = 0;
    for (key, owner) in keys.iter().zip(&before) {
        let now = ring.get(key).unwrap();
        if owner == "C" {
            moved += 1;
            assert_ne!(now, "C");
        } else {
            assert_eq!(&now, owner);
        }
    }
    let fraction = moved as f64 / keys.len() as f64;
    assert!((0.1..0.6).contains(&fraction), "moved {fraction}");
}

#[test]
fn test_consistent_hash_without_key_still_picks() {
    let nodes = vec![weighted(service("a", "a:1")), weighted(service("b", "b:1"))];
    let balancer = ConsistentHashBalancer::new();
    let picked = balancer.pick(&PickContext::new(), &nodes).unwrap();
    assert!(["a:1", "b:1"].contains(&picked.address()));
}

#[test]
fn test_consistent_hash_is_stable_across_concurrent_candidate_sets() {
    let all: Vec<Arc<dyn WeightedNode>> = (1..=5)
        .map(|i| weighted(service(&format!("{i}"), &format!("10.0.0.{i}:9000"))))
        .collect();
    let subset: Vec<Arc<dyn WeightedNode>> = all[..3].to_vec();
    let balancer = Arc::new(ConsistentHashBalancer::new());
    balancer.update(&all);

    let keys: Vec<String> = (0..200).map(|i| format!("user-{i}")).collect();
    let expected: Vec<String> = keys
        .iter()
        .map(|k| {
            let ctx = PickContext::new().with_hash_key(k.clone());
            balancer.pick(&ctx, &subset).unwrap().address().to_string()
        })
        .collect();

    let full_picker = {
        let balancer = balancer.clone();
        let all = all.clone();
        let keys = keys.clone();
        std::thread::spawn(move || {
            for _ in 0..50 {
                for k in &keys {
                    let ctx = PickContext::new().with_hash_key(k.clone());
                    balancer.pick(&ctx, &all).unwrap();
                }
            }
        })
    };

    for _ in 0..50 {
        for (k, owner) in keys.iter().zip(&expected) {
            let ctx = PickContext::new().with_hash_key(k.clone());
            assert_eq!(balancer.pick(&ctx, &subset).unwrap().address(), owner);
        }
    }
    full_picker.join().unwrap();

    // 完整快照上的归属节点在候选集中时，两者选择一致
    for (k, owner) in keys.iter().zip(&expected) {
        let ctx = PickContext::new().with_hash_key(k.clone());
        let full_owner = balancer.pick(&ctx, &all).unwrap();
        if subset.iter().any(|n| n.address() == full_owner.address()) {
            assert_eq!(full_owner.address(), owner);
        }
    }
    assert_eq!(balancer.ring().len(), 5);
}

#[test]
fn test_node_set_save_syncs_hash_ring() {
    let balancer = Arc::new(ConsistentHashBalancer::new());
    let set = NodeSet::new(balancer.clone());
    set.save(vec![node(service("a", "a:1")), node(service("b", "b:1"))]);
    assert_eq!(balancer.ring().len(), 2);

    let ctx = PickContext::new().with_hash_key("order-9");
    let owner = set.pick(&ctx, &[]).unwrap().address().to_string();
    // 过滤只影响本次候选集，不改动环
    let only_a = filter_fn(|_ctx, nodes| nodes.into_iter().filter(|n| n.address() == "a:1").collect());
    assert_eq!(set.pick(&ctx, &[only_a]).unwrap().address(), "a:1");
    assert_eq!(balancer.ring().len(), 2);
    assert_eq!(set.pick(&ctx, &[]).unwrap().address(), owner);

    set.save(vec![node(service("c", "c:1"))]);
    assert_eq!(balancer.ring().len(), 1);
    assert!(balancer.ring().contains(&"c:1".to_string()));
}

#[test]
fn test_node_set_empty_returns_no_available_node() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    assert!(set.is_empty());
    let err = set.pick(&PickContext::new(), &[]).unwrap_err();
    assert_eq!(err, BalancerError::NoAvailableNode);
}

#[test]
fn test_node_set_refuses_empty_save() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    assert!(set.save(vec![node(service("a", "a:1")), node(service("b", "b:1"))]));
    assert!(!set.save(Vec::new()));
    assert_eq!(set.len(), 2);
}

#[test]
fn test_node_set_save_replaces_wholesale() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    set.save(vec![node(service("a", "a:1")), node(service("b", "b:1"))]);
    let before = set.nodes();

    set.save(vec![node(service("c", "c:1"))]);
    let after = set.nodes();

    // 旧快照的持有者不受影响
    assert_eq!(before.len(), 2);
    assert_eq!(after.len(), 1);
    assert_eq!(set.pick(&PickContext::new(), &[]).unwrap().address(), "c:1");
}

#[test]
fn test_filters_run_in_order() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    set.save(vec![
        node(service("a", "a:1").with_version("v1").with_metadata("zone", "east")),
        node(service("b", "b:1").with_version("v2").with_metadata("zone", "east")),
        node(service("c", "c:1").with_version("v2").with_metadata("zone", "west")),
    ]);

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let recorder = {
        let seen = seen.clone();
        filter_fn(move |_ctx, nodes| {
            seen.lock().unwrap().push(nodes.len());
            nodes
        })
    };
    let filters: Vec<Arc<dyn NodeFilter>> = vec![
        version_filter("v2"),
        recorder,
        metadata_filter("zone", Some("west".to_string())),
    ];

    for _ in 0..10 {
        let picked = set.pick(&PickContext::new(), &filters).unwrap();
        assert_eq!(picked.address(), "c:1");
    }
    // 第二个过滤器只看到版本过滤后的两个节点
    assert!(seen.lock().unwrap().iter().all(|n| *n == 2));
}

#[test]
fn test_default_filters_run_before_call_filters() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()))
        .with_filter(metadata_filter("canary", None));
    set.save(vec![
        node(service("a", "a:1")),
        node(service("b", "b:1").with_metadata("canary", "true")),
    ]);
    for _ in 0..5 {
        assert_eq!(set.pick(&PickContext::new(), &[]).unwrap().address(), "b:1");
    }
}

#[test]
fn test_filter_reads_pick_context() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    set.save(vec![
        node(service("a", "a:1").with_metadata("zone", "east")),
        node(service("b", "b:1").with_metadata("zone", "west")),
    ]);
    let zone_affinity = filter_fn(|ctx, nodes| match ctx.get("zone") {
        Some(zone) => nodes
            .into_iter()
            .filter(|n| n.metadata().get("zone").map(String::as_str) == Some(zone))
            .collect(),
        None => nodes,
    });

    let ctx = PickContext::new().with_metadata("zone", "west");
    for _ in 0..5 {
        assert_eq!(set.pick(&ctx, &[zone_affinity.clone()]).unwrap().address(), "b:1");
    }
}

#[test]
fn test_filters_rejecting_everything_fall_back_to_snapshot() {
    let set = NodeSet::new(Arc::new(WrrBalancer::new()));
    set.save(vec![node(service("a", "a:1")), node(service("b", "b:1"))]);

    let reject_all = filter_fn(|_ctx, _nodes| Vec::new());
    let mut seen = std::collections::HashSet::new();
    for _ in 0..4 {
        let picked = set.pick(&PickContext::new(), &[reject_all.clone()]).unwrap();
        seen.insert(picked.address().to_string());
    }
    assert_eq!(seen.len(), 2);
}

#[test]
fn test_concurrent_pick_during_save() {
    let set = Arc::new(NodeSet::new(Arc::new(WrrBalancer::new())));
    set.save(vec![node(service("a", "a:1"))]);

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let set = set.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let picked = set.pick(&PickContext::new(), &[]).unwrap();
                    assert!(["a:1", "b:1", "c:1"].contains(&picked.address()));
                }
            })
        })
        .collect();

    for i in 0..200 {
        let nodes = if i % 2 == 0 {
            vec![node(service("b", "b:1")), node(service("c", "c:1"))]
        } else {
            vec![node(service("a", "a:1"))]
        };
        set.save(nodes);
    }

    for reader in readers {
        reader.join().unwrap();
    }
}
