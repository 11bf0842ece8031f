use pcct_core::{CsListId, CsPayload, DiskSlot, EntryId, LocalityDomain, PccSearch, Pcct};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8),
    Erase(u8),
    AddToken(u8),
    RemoveToken(u8),
    Append(u8, bool),
    Remove(u8),
    MoveToLast(u8),
    Evict(bool, u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Insert),
        1 => any::<u8>().prop_map(Op::Erase),
        1 => any::<u8>().prop_map(Op::AddToken),
        1 => any::<u8>().prop_map(Op::RemoveToken),
        3 => (any::<u8>(), any::<bool>()).prop_map(|(k, d)| Op::Append(k, d)),
        1 => any::<u8>().prop_map(Op::Remove),
        2 => any::<u8>().prop_map(Op::MoveToLast),
        1 => (any::<bool>(), 0u8..6).prop_map(|(d, n)| Op::Evict(d, n)),
    ]
}

fn list(direct: bool) -> CsListId {
    if direct {
        CsListId::Direct
    } else {
        CsListId::Indirect
    }
}

/// Only 32 distinct names and a coarse hash, so collisions are common.
fn search(k: u8) -> (u64, Vec<u8>) {
    let k = k % 32;
    ((k % 4) as u64, format!("/p/{k}").into_bytes())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_ops_keep_structures_consistent(ops in prop::collection::vec(op(), 1..200)) {
        let mut pcct = Pcct::new("prop", 15, LocalityDomain::ANY).unwrap();
        pcct.set_disk_store(Arc::new(|_: DiskSlot| {}));
        // model: key -> live entry
        let mut live: HashMap<u8, EntryId> = HashMap::new();

        for op in ops {
            match op {
                Op::Insert(k) => {
                    let (hash, name) = search(k);
                    let s = PccSearch::new(&name);
                    match pcct.insert(hash, &s) {
                        Ok((id, is_new)) => {
                            prop_assert_eq!(is_new, !live.contains_key(&(k % 32)));
                            live.insert(k % 32, id);
                        }
                        Err(_) => {
                            prop_assert_eq!(pcct.available_capacity(), 0);
                            prop_assert!(!live.contains_key(&(k % 32)));
                        }
                    }
                }
                Op::Erase(k) => {
                    if let Some(id) = live.remove(&(k % 32)) {
                        pcct.erase(id);
                    }
                }
                Op::AddToken(k) => {
                    if let Some(&id) = live.get(&(k % 32)) {
                        let t = pcct.add_token(id).unwrap();
                        prop_assert_eq!(pcct.add_token(id).unwrap(), t);
                        prop_assert_eq!(pcct.find_by_token(t.value()), Some(id));
                    }
                }
                Op::RemoveToken(k) => {
                    if let Some(&id) = live.get(&(k % 32)) {
                        let old = pcct.entry(id).unwrap().token();
                        pcct.remove_token(id);
                        if let Some(t) = old {
                            prop_assert_eq!(pcct.find_by_token(t.value()), None);
                        }
                    }
                }
                Op::Append(k, direct) => {
                    if let Some(&id) = live.get(&(k % 32)) {
                        if pcct.entry(id).unwrap().cs_list().is_none() {
                            let payload = if direct {
                                CsPayload::Direct(vec![k])
                            } else {
                                CsPayload::Indirect(DiskSlot::new(k as u64 + 1).unwrap())
                            };
                            pcct.cs_append(id, payload);
                            prop_assert_eq!(pcct.entry(id).unwrap().cs_list(), Some(list(direct)));
                        }
                    }
                }
                Op::Remove(k) => {
                    if let Some(&id) = live.get(&(k % 32)) {
                        if pcct.entry(id).unwrap().cs_list().is_some() {
                            pcct.cs_remove(id);
                            prop_assert_eq!(pcct.entry(id).unwrap().cs_list(), None);
                        }
                    }
                }
                Op::MoveToLast(k) => {
                    if let Some(&id) = live.get(&(k % 32)) {
                        if let Some(l) = pcct.entry(id).unwrap().cs_list() {
                            pcct.cs_move_to_last(id);
                            prop_assert_eq!(pcct.cs_ids(l).last().copied(), Some(id));
                        }
                    }
                }
                Op::Evict(direct, max) => {
                    let l = list(direct);
                    let before = pcct.cs_ids(l);
                    let mut seen = Vec::new();
                    let n = pcct.cs_evict_bulk(l, max as u32, |t, id| {
                        seen.push(id);
                        t.erase(id);
                    });
                    prop_assert_eq!(n as usize, before.len().min(max as usize));
                    prop_assert_eq!(&seen[..], &before[..n as usize]);
                    live.retain(|_, id| !seen.contains(id));
                }
            }

            // no entry in two lists, counts agree, every index agrees
            let direct = pcct.cs_ids(CsListId::Direct);
            let indirect = pcct.cs_ids(CsListId::Indirect);
            for id in &direct {
                prop_assert!(!indirect.contains(id));
            }
            prop_assert_eq!(pcct.len(), live.len());
            pcct.validate_invariants();
        }
    }

    #[test]
    fn tokens_are_unique_among_live_entries(n in 1usize..15, churn in 0usize..40) {
        let mut pcct = Pcct::new("prop-tok", 15, LocalityDomain::ANY).unwrap();
        let mut ids = Vec::new();
        for i in 0..n {
            let name = format!("/t/{i}");
            let s = PccSearch::new(name.as_bytes());
            ids.push(pcct.insert(s.hash(), &s).unwrap().0);
        }
        for i in 0..churn {
            let id = ids[i % n];
            pcct.add_token(id).unwrap();
            if i % 3 == 0 {
                pcct.remove_token(id);
            }
        }
        let mut tokens: Vec<_> = ids
            .iter()
            .filter_map(|&id| pcct.entry(id).unwrap().token())
            .collect();
        let total = tokens.len();
        tokens.sort();
        tokens.dedup();
        prop_assert_eq!(tokens.len(), total);
        for &id in &ids {
            if let Some(t) = pcct.entry(id).unwrap().token() {
                prop_assert_eq!(pcct.find_by_token(t.value()), Some(id));
            }
        }
    }
}

#[test]
fn random_cache_churn_stays_consistent() {
    let id = format!("stress-{}", rand::random::<u16>());
    let mut pcct = Pcct::new(&id, 255, LocalityDomain::ANY).unwrap();
    let mut cached: Vec<EntryId> = Vec::new();

    for _ in 0..5_000 {
        let name = format!("/s/{}", rand::random::<u16>() % 512);
        let s = PccSearch::new(name.as_bytes());
        let id = match pcct.insert(s.hash(), &s) {
            Ok((id, _)) => id,
            Err(_) => {
                let n = pcct.cs_evict_bulk(CsListId::Direct, 16, |t, id| t.erase(id));
                assert!(n > 0, "full table with an empty cache");
                cached.retain(|id| pcct.entry(*id).is_some());
                continue;
            }
        };
        if pcct.entry(id).unwrap().cs_list().is_some() {
            pcct.cs_move_to_last(id);
        } else {
            pcct.cs_append(id, CsPayload::Direct(name.into_bytes()));
            cached.push(id);
        }
    }

    pcct.validate_invariants();
    assert_eq!(pcct.cs_count(CsListId::Direct), pcct.len());
    assert_eq!(cached.len(), pcct.len());
}
