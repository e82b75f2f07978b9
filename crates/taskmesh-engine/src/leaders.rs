//! Leader and backup-leader election for group-based strategies.
//!
//! Within each group, weighted betweenness centrality restricted to the
//! group's induced subgraph ranks the members; the best non-faulted member
//! leads, the next two back it up. A faulted leader (possible only when
//! every member is faulted) is replaced by the first backup, and a group
//! that ends up with no eligible leader contributes no migrations.

use std::collections::BTreeMap;

use taskmesh_core::{AgentId, Graph, GroupId, World};

/// Maximum number of backup leaders per group.
pub const MAX_BACKUP_LEADERS: usize = 2;

/// Elects a leader and backups for every group that has none yet, then
/// demotes faulted leaders. Groups visited in ascending id order.
pub fn elect_leaders(world: &mut World, graph: &Graph) {
    let group_ids: Vec<GroupId> = world.groups.keys().copied().collect();

    for group_id in group_ids {
        if world.groups[&group_id].leader.is_some() {
            continue;
        }
        let members = world.groups[&group_id].members.clone();
        let scores = graph.betweenness(&members);

        let leader = pick_best(world, &scores, |w, id| !w.agents[&id].fault_functional)
            .or_else(|| pick_best(world, &scores, |_, _| true));

        let mut backups: Vec<(AgentId, f64)> = scores
            .iter()
            .map(|(&id, &score)| (id, score))
            .filter(|&(id, _)| Some(id) != leader && !world.agents[&id].fault_functional)
            .collect();
        backups.sort_by(|x, y| y.1.total_cmp(&x.1).then_with(|| x.0.cmp(&y.0)));
        backups.truncate(MAX_BACKUP_LEADERS);

        if let Some(group) = world.groups.get_mut(&group_id) {
            group.leader = leader;
            group.backup_leaders = backups.into_iter().map(|(id, _)| id).collect();
        }
    }

    replace_faulted_leaders(world);
}

/// Promotes the first backup wherever the elected leader is faulted;
/// leaves the group leaderless when no backup is eligible.
fn replace_faulted_leaders(world: &mut World) {
    let group_ids: Vec<GroupId> = world.groups.keys().copied().collect();
    for group_id in group_ids {
        let leader_faulted = world.groups[&group_id]
            .leader
            .is_some_and(|id| world.agents[&id].fault_functional);
        if !leader_faulted {
            continue;
        }
        if let Some(group) = world.groups.get_mut(&group_id) {
            group.leader = if group.backup_leaders.is_empty() {
                None
            } else {
                Some(group.backup_leaders.remove(0))
            };
        }
    }
}

/// Highest-scoring member passing the filter; ties go to the smallest id.
fn pick_best(
    world: &World,
    scores: &BTreeMap<AgentId, f64>,
    eligible: impl Fn(&World, AgentId) -> bool,
) -> Option<AgentId> {
    let mut best: Option<(AgentId, f64)> = None;
    for (&id, &score) in scores {
        if !eligible(world, id) {
            continue;
        }
        match best {
            Some((_, best_score)) if score <= best_score => {}
            _ => best = Some((id, score)),
        }
    }
    best.map(|(id, _)| id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskmesh_core::{Agent, GroupId};

    fn path_world(faulted: &[u32]) -> (World, Graph) {
        // Path 0 - 1 - 2 in a single group: agent 1 is the clear center.
        let agents: Vec<Agent> = (0..3)
            .map(|i| {
                let mut a = Agent::new(AgentId::new(i), 10.0, GroupId::new(0));
                a.fault_functional = faulted.contains(&i);
                a
            })
            .collect();
        let world = World::from_inputs(Vec::new(), agents).expect("world");
        let mut graph = Graph::new();
        graph.add_edge(AgentId::new(0), AgentId::new(1), 1.0);
        graph.add_edge(AgentId::new(1), AgentId::new(2), 1.0);
        (world, graph)
    }

    #[test]
    fn central_member_leads() {
        let (mut world, graph) = path_world(&[]);
        elect_leaders(&mut world, &graph);
        let group = &world.groups[&GroupId::new(0)];
        assert_eq!(group.leader, Some(AgentId::new(1)));
        // Backups are the two remaining members, lowest id first on ties.
        assert_eq!(group.backup_leaders, vec![AgentId::new(0), AgentId::new(2)]);
    }

    #[test]
    fn faulted_center_is_skipped() {
        let (mut world, graph) = path_world(&[1]);
        elect_leaders(&mut world, &graph);
        let group = &world.groups[&GroupId::new(0)];
        // 0 and 2 tie at zero centrality; the smaller id wins.
        assert_eq!(group.leader, Some(AgentId::new(0)));
        assert_eq!(group.backup_leaders, vec![AgentId::new(2)]);
    }

    #[test]
    fn all_faulted_leaves_group_leaderless() {
        let (mut world, graph) = path_world(&[0, 1, 2]);
        elect_leaders(&mut world, &graph);
        assert_eq!(world.groups[&GroupId::new(0)].leader, None);
        assert!(world.groups[&GroupId::new(0)].backup_leaders.is_empty());
    }

    #[test]
    fn existing_leaders_are_kept() {
        let (mut world, graph) = path_world(&[]);
        if let Some(group) = world.groups.get_mut(&GroupId::new(0)) {
            group.leader = Some(AgentId::new(2));
        }
        elect_leaders(&mut world, &graph);
        assert_eq!(world.groups[&GroupId::new(0)].leader, Some(AgentId::new(2)));
    }
}
