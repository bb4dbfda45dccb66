use crate::fingerprint::Fingerprint;

/// One similarity group. `members` are indices into the fingerprint arena
/// handed to [`cluster`], in the order they joined; the first member is the
/// leader. Ids are assigned sequentially as groups are opened and are never
/// reused, so after singleton groups are discarded the surviving ids may
/// have gaps — downstream output keeps those ids as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: u32,
    pub members: Vec<usize>,
}

impl Group {
    pub fn leader(&self) -> usize {
        self.members[0]
    }
}

/// Single-pass greedy grouping: walk the arena in input order; each
/// unprocessed item opens a group and pulls in every later unprocessed item
/// within `threshold` Hamming distance of *it* (the leader). This is
/// deliberately not transitive closure — an item within threshold of a
/// member but not of the leader will not join — and the behavior is a
/// compatibility contract, not an optimization shortcut to tighten.
pub fn cluster(fingerprints: &[Fingerprint], threshold: u32) -> Vec<Group> {
    let mut processed = vec![false; fingerprints.len()];
    let mut groups: Vec<Group> = Vec::new();

    for leader in 0..fingerprints.len() {
        if processed[leader] {
            continue;
        }
        let mut group = Group {
            id: groups.len() as u32 + 1,
            members: vec![leader],
        };
        processed[leader] = true;

        for candidate in 0..fingerprints.len() {
            if processed[candidate] {
                continue;
            }
            if fingerprints[leader].distance(&fingerprints[candidate]) <= threshold {
                group.members.push(candidate);
                processed[candidate] = true;
            }
        }
        groups.push(group);
    }

    groups
}

/// Drop groups with fewer than two members. Surviving groups keep their
/// original ids.
pub fn discard_singletons(groups: Vec<Group>) -> Vec<Group> {
    groups.into_iter().filter(|g| g.members.len() >= 2).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fp(bytes: &[u8]) -> Fingerprint {
        Fingerprint::from_bytes(bytes.to_vec())
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(cluster(&[], 5).is_empty());
    }

    #[test]
    fn leader_neighborhood_not_transitive_closure() {
        // d(a, b) = 3, d(a, c) = 8, d(b, c) = 5. With threshold 5, c is
        // within range of b but not of a; since b is already claimed by a's
        // group, c ends up alone.
        let a = fp(&[0b0000_0000, 0x00]);
        let b = fp(&[0b0000_0111, 0x00]);
        let c = fp(&[0b1111_1111, 0x00]);
        assert_eq!(a.distance(&b), 3);
        assert_eq!(a.distance(&c), 8);
        assert_eq!(b.distance(&c), 5);

        let groups = cluster(&[a, b, c], 5);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, 1);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[1].id, 2);
        assert_eq!(groups[1].members, vec![2]);

        let kept = discard_singletons(groups);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].members, vec![0, 1]);
    }

    #[test]
    fn grouping_depends_on_input_order() {
        // Same three prints as above but c first: c leads, b (distance 5)
        // joins c, and a is left alone.
        let a = fp(&[0b0000_0000, 0x00]);
        let b = fp(&[0b0000_0111, 0x00]);
        let c = fp(&[0b1111_1111, 0x00]);

        let kept = discard_singletons(cluster(&[c, b, a], 5));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].members, vec![0, 1]); // c and b
    }

    #[test]
    fn surviving_ids_keep_gaps_after_singleton_discard() {
        // First item is isolated; second and third pair up as group 2.
        let lone = fp(&[0xFF, 0xFF]);
        let x = fp(&[0x00, 0x00]);
        let y = fp(&[0x01, 0x00]);

        let kept = discard_singletons(cluster(&[lone, x, y], 5));
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].id, 2);
    }

    #[test]
    fn members_are_disjoint() {
        let prints: Vec<Fingerprint> = (0..8u8).map(|i| fp(&[i, 0x00])).collect();
        let groups = cluster(&prints, 2);
        let mut seen = vec![false; prints.len()];
        for group in &groups {
            for &member in &group.members {
                assert!(!seen[member], "member {member} appears twice");
                seen[member] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn every_member_is_within_threshold_of_its_leader() {
        let prints: Vec<Fingerprint> = (0..16u8).map(|i| fp(&[i.wrapping_mul(37), i])).collect();
        let threshold = 4;
        for group in cluster(&prints, threshold) {
            let leader = &prints[group.leader()];
            for &member in &group.members {
                assert!(leader.distance(&prints[member]) <= threshold);
            }
        }
    }
}
